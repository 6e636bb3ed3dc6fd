//! xkcd-dns - Serve xkcd comics over DNS TXT records
//!
//! Answers TXT queries under a configurable zone with the title, image URL
//! and alt text of xkcd comics, fetched on demand and cached in memory.

mod body;
mod comic;
mod config;
mod dns;
mod error;
mod logging;
mod tokio_io;

use comic::{spawn_sweeper, ComicCache, ComicResolver, HttpsFetcher};
use config::{load_config, normalize_zone, DEFAULT_CONFIG_YAML};
use dns::run_dns_server;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args: Vec<String> = env::args().collect();

    // Parse command line arguments
    let mut config_path: Option<&str> = None;
    let mut cli_listen_addr: Option<String> = None;
    let mut cli_zone: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                config_path = args.get(i).map(|s| s.as_str());
            }
            "--listen" => {
                i += 1;
                cli_listen_addr = args.get(i).cloned();
            }
            "--zone" => {
                i += 1;
                cli_zone = args.get(i).cloned();
            }
            "--print-config" => {
                print!("{}", DEFAULT_CONFIG_YAML);
                return Ok(());
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                return Ok(());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    // Load config from file
    let mut config = load_config(config_path)?;

    // CLI arguments override config file
    if let Some(addr) = cli_listen_addr {
        config.dns.listen = addr;
    }
    if let Some(zone) = cli_zone {
        config.zone = zone;
    }

    // Initialize logging system
    let _log_guard = logging::init_logging(&config.logging);

    // Spawn log cleanup task if file logging enabled
    logging::spawn_log_cleanup_task(&config.logging);

    tracing::debug!(config = ?config, "Configuration loaded");

    let listen_addr: SocketAddr = config.dns.listen.parse()?;
    let zone = normalize_zone(&config.zone);
    let enable_logging = config.logging.log_requests;

    let cache = Arc::new(ComicCache::new(&config.cache));
    // Dropping the handle stops the sweeper, so keep it for the server's lifetime
    let _sweeper = spawn_sweeper(Arc::clone(&cache), config.cache.sweep_interval());

    let fetcher = HttpsFetcher::new(config.upstream.clone())?;
    let resolver = Arc::new(ComicResolver::new(
        fetcher,
        cache,
        config.upstream.clone(),
        enable_logging,
    ));

    println!("DNS server listening on {}", listen_addr);
    println!("Zone: {}", zone);
    println!(
        "Comic cache: expiry {}s, sweep every {}s",
        config.cache.expiry_seconds,
        config.cache.sweep_interval().as_secs()
    );
    if enable_logging {
        info!(zone = %zone, upstream = %config.upstream.comic_base_url, "Starting xkcd-dns");
    }

    if let Err(e) = run_dns_server(listen_addr, zone, resolver, enable_logging).await {
        error!(error = %e, "DNS server error");
        return Err(e.into());
    }

    Ok(())
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [options]", program);
    eprintln!();
    eprintln!("Serve xkcd comics as DNS TXT records.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <path>     Load config from YAML file");
    eprintln!("  --listen <addr>         Address to listen on (e.g., 0.0.0.0:53 or [::]:53)");
    eprintln!("  --zone <name>           Parent zone to answer for (default: xkcd.)");
    eprintln!("  --print-config          Print the default config.yaml and exit");
    eprintln!("  -h, --help              Show this help message");
    eprintln!();
    eprintln!("Queries (TXT):");
    eprintln!("  xkcd.                   Random comic, all fields");
    eprintln!("  title.xkcd.             Random comic, title only (also img, alt)");
    eprintln!("  614.xkcd.               Comic 614, all fields");
    eprintln!("  alt.614.xkcd.           Comic 614, alt text only");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} --listen 127.0.0.1:5353", program);
    eprintln!("  dig @127.0.0.1 -p 5353 TXT title.614.xkcd +short");
}
