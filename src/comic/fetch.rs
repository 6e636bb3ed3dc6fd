//! Comic page fetching over HTTP(S).

use crate::body::{collect_limited, Empty, LimitedError};
use crate::config::UpstreamConfig;
use crate::error::{ResolveError, ServerError};
use crate::tokio_io::TokioIo;
use bytes::Bytes;
use hyper::body::Incoming;
use hyper::header::{ACCEPT, HOST, LOCATION, USER_AGENT};
use hyper::{Method, Request, Response, Uri};
use rustls::pki_types::ServerName;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Final response of a fetch, after redirects
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches comic pages.
///
/// Implementations:
/// - HttpsFetcher: hyper HTTP/1.1 client with rustls
/// - Test mocks counting calls and returning canned pages
pub trait ComicFetcher: Send + Sync {
    /// GET `url`. Transport failures and timeouts are `FetchFailed`;
    /// any HTTP status, success or not, is returned as a `FetchResponse`.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchResponse, ResolveError>> + Send;
}

/// Create a TLS connector trusting the webpki root certificates
pub fn create_tls_connector() -> TlsConnector {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// HTTP/1.1 fetcher with redirect following, a body cap and an overall timeout
pub struct HttpsFetcher {
    tls_connector: TlsConnector,
    config: UpstreamConfig,
}

impl HttpsFetcher {
    pub fn new(config: UpstreamConfig) -> Result<Self, ServerError> {
        for url in [&config.comic_base_url, &config.random_url] {
            let uri: Uri = url
                .parse()
                .map_err(|e| ServerError::Config(format!("invalid upstream URL {}: {}", url, e)))?;
            if !matches!(uri.scheme_str(), Some("http") | Some("https")) || uri.host().is_none() {
                return Err(ServerError::Config(format!(
                    "upstream URL must be absolute http(s): {}",
                    url
                )));
            }
        }

        Ok(HttpsFetcher {
            tls_connector: create_tls_connector(),
            config,
        })
    }

    async fn fetch_following_redirects(&self, url: &str) -> Result<FetchResponse, ResolveError> {
        let mut uri: Uri = url
            .parse()
            .map_err(|e| ResolveError::FetchFailed(format!("invalid URL {}: {}", url, e)))?;

        for _ in 0..=self.config.max_redirects {
            let response = self.get_once(&uri).await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        ResolveError::FetchFailed(format!("{} redirect without Location", status))
                    })?;
                let next = resolve_location(&uri, location)?;
                debug!(from = %uri, to = %next, status = status.as_u16(), "Following redirect");
                uri = next;
                continue;
            }

            let body = collect_limited(response.into_body(), self.config.max_body_bytes)
                .await
                .map_err(|e| match e {
                    LimitedError::LimitExceeded(e) => ResolveError::FetchFailed(e.to_string()),
                    LimitedError::Inner(e) => {
                        ResolveError::FetchFailed(format!("reading body: {}", e))
                    }
                })?;

            return Ok(FetchResponse {
                status: status.as_u16(),
                body,
            });
        }

        Err(ResolveError::FetchFailed(format!(
            "more than {} redirects",
            self.config.max_redirects
        )))
    }

    /// Issue a single GET on a fresh connection
    async fn get_once(&self, uri: &Uri) -> Result<Response<Incoming>, ResolveError> {
        let use_tls = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            other => {
                return Err(ResolveError::FetchFailed(format!(
                    "unsupported scheme {:?}",
                    other
                )))
            }
        };
        let host = connect_host(uri)
            .ok_or_else(|| ResolveError::FetchFailed(format!("no host in {}", uri)))?;
        let port = uri.port_u16().unwrap_or(if use_tls { 443 } else { 80 });
        let authority = uri.authority().map(|a| a.as_str()).unwrap_or(host);
        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(HOST, authority)
            .header(USER_AGENT, &self.config.user_agent)
            .header(ACCEPT, "text/html")
            .body(Empty::<Bytes>::new())
            .map_err(|e| ResolveError::FetchFailed(format!("building request: {}", e)))?;

        let tcp_stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| ResolveError::FetchFailed(format!("connect {}:{}: {}", host, port, e)))?;

        if use_tls {
            let server_name = ServerName::try_from(host.to_string())
                .map_err(|_| ResolveError::FetchFailed(format!("invalid server name {}", host)))?;
            let tls_stream = self
                .tls_connector
                .connect(server_name, tcp_stream)
                .await
                .map_err(|e| ResolveError::FetchFailed(format!("TLS with {}: {}", host, e)))?;
            send_request(TokioIo::new(tls_stream), request).await
        } else {
            send_request(TokioIo::new(tcp_stream), request).await
        }
    }
}

impl ComicFetcher for HttpsFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, ResolveError> {
        match tokio::time::timeout(self.config.timeout(), self.fetch_following_redirects(url)).await
        {
            Ok(result) => result,
            Err(_) => Err(ResolveError::FetchFailed(format!(
                "timed out after {}ms",
                self.config.timeout_ms
            ))),
        }
    }
}

async fn send_request<T>(
    io: T,
    request: Request<Empty<Bytes>>,
) -> Result<Response<Incoming>, ResolveError>
where
    T: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| ResolveError::FetchFailed(format!("HTTP handshake: {}", e)))?;

    // Connection driver lives until the body is drained and the sender dropped
    tokio::spawn(async move {
        if let Err(err) = conn.await {
            debug!(error = ?err, "Upstream connection driver error");
        }
    });

    sender
        .send_request(request)
        .await
        .map_err(|e| ResolveError::FetchFailed(format!("sending request: {}", e)))
}

/// Host to connect to and verify, with IPv6 literal brackets removed
fn connect_host(uri: &Uri) -> Option<&str> {
    uri.host()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
        .filter(|host| !host.is_empty())
}

/// Resolve a Location header against the URI that produced it
fn resolve_location(base: &Uri, location: &str) -> Result<Uri, ResolveError> {
    let scheme = base.scheme_str().unwrap_or("https");
    let absolute = if location.starts_with("//") {
        format!("{}:{}", scheme, location)
    } else if location.starts_with('/') {
        let authority = base
            .authority()
            .ok_or_else(|| ResolveError::FetchFailed(format!("no authority in {}", base)))?;
        format!("{}://{}{}", scheme, authority, location)
    } else if location.contains("://") {
        location.to_string()
    } else {
        return Err(ResolveError::FetchFailed(format!(
            "unsupported redirect target {}",
            location
        )));
    };

    absolute
        .parse()
        .map_err(|e| ResolveError::FetchFailed(format!("invalid redirect {}: {}", location, e)))
}
