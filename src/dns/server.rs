//! UDP DNS server answering comic queries with TXT records.

use crate::comic::{ComicFetcher, ComicResolver};
use crate::dns::classify::classify;
use crate::dns::response::{build_answers, response_code_for};
use crate::dns::wire::{build_txt_response, DnsQuery, ResponseCode};
use crate::error::ServerError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

/// Run the DNS server until the socket fails
pub async fn run_dns_server<F>(
    listen_addr: SocketAddr,
    zone: String,
    resolver: Arc<ComicResolver<F>>,
    enable_logging: bool,
) -> Result<(), ServerError>
where
    F: ComicFetcher + Send + Sync + 'static,
{
    let socket = Arc::new(UdpSocket::bind(listen_addr).await?);
    let zone: Arc<str> = Arc::from(zone);

    if enable_logging {
        info!(listen = %listen_addr, zone = %zone, "DNS server started");
    }

    loop {
        let mut buf = vec![0u8; 512];
        let (len, src) = socket.recv_from(&mut buf).await?;
        buf.truncate(len);

        if enable_logging {
            debug!(bytes = len, client = %src, "DNS query received");
        }

        let socket_clone = Arc::clone(&socket);
        let resolver_clone = Arc::clone(&resolver);
        let zone_clone = Arc::clone(&zone);

        tokio::spawn(async move {
            let Some(response) =
                handle_dns_query(&resolver_clone, &buf, src, &zone_clone, enable_logging).await
            else {
                return;
            };

            if let Err(e) = socket_clone.send_to(&response, src).await {
                if enable_logging {
                    error!(client = %src, error = %e, "DNS failed to send response");
                }
            } else if enable_logging {
                debug!(bytes = response.len(), client = %src, "DNS response sent");
            }
        });
    }
}

/// Answer one query packet.
///
/// Returns `None` when nothing should be sent back: unparseable packets,
/// responses, and messages without exactly one question.
pub async fn handle_dns_query<F: ComicFetcher>(
    resolver: &ComicResolver<F>,
    query_buf: &[u8],
    client: SocketAddr,
    zone: &str,
    enable_logging: bool,
) -> Option<Vec<u8>> {
    let query = match DnsQuery::parse(query_buf) {
        Ok(q) => q,
        Err(e) => {
            if enable_logging {
                debug!(
                    client = %client,
                    error = %e,
                    bytes = query_buf.len(),
                    "DNS dropping unparseable packet"
                );
            }
            return None;
        }
    };

    if query.is_response() || query.question_count() != 1 {
        if enable_logging {
            debug!(
                client = %client,
                is_response = query.is_response(),
                questions = query.question_count(),
                "DNS dropping packet"
            );
        }
        return None;
    }

    let name = query.name();
    if enable_logging {
        info!(
            id = query.id(),
            client = %client,
            name = %name,
            qtype = %query.query_type(),
            "DNS query"
        );
    }

    let (target, selector) = match classify(name, zone) {
        Ok(classified) => classified,
        Err(e) => {
            if enable_logging {
                warn!(name = %name, selector = "none", error = %e, "DNS query failed");
            }
            return Some(build_txt_response(query_buf, &query, response_code_for(&e), &[]));
        }
    };

    match resolver.resolve(target).await {
        Ok(comic) => {
            let answers = build_answers(name, &comic, selector);
            if enable_logging {
                debug!(
                    name = %name,
                    comic = comic.id,
                    answers = answers.len(),
                    "DNS answering"
                );
            }
            Some(build_txt_response(query_buf, &query, ResponseCode::NoError, &answers))
        }
        Err(e) => {
            let rcode = response_code_for(&e);
            if enable_logging {
                warn!(
                    name = %name,
                    selector = %selector,
                    target = %target,
                    rcode = %rcode,
                    error = %e,
                    "DNS query failed"
                );
            }
            Some(build_txt_response(query_buf, &query, rcode, &[]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comic::testing::{comic_page, page, MockFetcher};
    use crate::comic::ComicCache;
    use crate::config::UpstreamConfig;
    use crate::dns::wire::{builder, DnsResponse, RecordType};
    use crate::error::ResolveError;
    use std::time::Duration;

    const ZONE: &str = "xkcd.";

    fn client() -> SocketAddr {
        "192.168.1.100:12345".parse().unwrap()
    }

    fn resolver(fetcher: MockFetcher) -> ComicResolver<MockFetcher> {
        let cache = Arc::new(ComicCache::with_expiry(Duration::from_secs(300)));
        ComicResolver::new(fetcher, cache, UpstreamConfig::default(), false)
    }

    async fn ask(resolver: &ComicResolver<MockFetcher>, name: &str) -> Vec<u8> {
        let query = builder::build_query(name, RecordType::TXT, 0x4242);
        handle_dns_query(resolver, &query, client(), ZONE, false)
            .await
            .expect("a response")
    }

    fn texts(response: &[u8]) -> Vec<String> {
        DnsResponse::parse(response)
            .unwrap()
            .txt_answers()
            .unwrap()
            .into_iter()
            .map(|a| a.text)
            .collect()
    }

    fn rcode(response: &[u8]) -> ResponseCode {
        DnsResponse::parse(response).unwrap().response_code()
    }

    #[tokio::test]
    async fn test_all_fields_answered_in_order() {
        let resolver = resolver(MockFetcher::serving(614, "Woodpecker", "extension cord"));

        let response = ask(&resolver, "614.xkcd.").await;
        let parsed = DnsResponse::parse(&response).unwrap();

        assert_eq!(parsed.id(), 0x4242);
        assert_eq!(parsed.response_code(), ResponseCode::NoError);
        assert!(parsed.is_authoritative());
        assert_eq!(parsed.min_ttl(), Some(0));
        assert_eq!(
            texts(&response),
            vec![
                "Woodpecker".to_string(),
                "https://imgs.xkcd.com/comics/comic_614.png".to_string(),
                "extension cord".to_string(),
            ]
        );
        for answer in parsed.txt_answers().unwrap() {
            assert_eq!(answer.name, "614.xkcd.");
        }
    }

    #[tokio::test]
    async fn test_single_field_query() {
        let resolver = resolver(MockFetcher::serving(614, "Woodpecker", "extension cord"));

        assert_eq!(texts(&ask(&resolver, "title.614.xkcd.").await), vec!["Woodpecker"]);
        assert_eq!(texts(&ask(&resolver, "alt.614.xkcd.").await), vec!["extension cord"]);
        assert_eq!(resolver.fetcher().calls(), 1);
    }

    #[tokio::test]
    async fn test_random_query() {
        let resolver = resolver(MockFetcher::serving(1024, "Error Code", "It's a 3.2 ms delay"));

        let response = ask(&resolver, "img.xkcd.").await;
        assert_eq!(
            texts(&response),
            vec!["https://imgs.xkcd.com/comics/comic_1024.png"]
        );
        assert!(resolver.cache().get(1024).await.is_some());
    }

    #[tokio::test]
    async fn test_invalid_name_is_nxdomain_without_fetch() {
        let resolver = resolver(MockFetcher::serving(1, "a", "b"));

        let response = ask(&resolver, "abc.xkcd.").await;
        assert_eq!(rcode(&response), ResponseCode::NxDomain);
        assert!(texts(&response).is_empty());
        assert_eq!(resolver.fetcher().calls(), 0);
    }

    #[tokio::test]
    async fn test_upstream_status_is_nxdomain() {
        let resolver = resolver(MockFetcher::new(|_, _| page(404, "Not Found")));

        let response = ask(&resolver, "404.xkcd.").await;
        assert_eq!(rcode(&response), ResponseCode::NxDomain);
    }

    #[tokio::test]
    async fn test_transport_error_is_servfail() {
        let resolver = resolver(MockFetcher::new(|_, _| {
            Err(ResolveError::FetchFailed("connection refused".to_string()))
        }));

        let response = ask(&resolver, "1.xkcd.").await;
        assert_eq!(rcode(&response), ResponseCode::ServFail);
    }

    #[tokio::test]
    async fn test_extraction_failure_is_servfail_and_cache_untouched() {
        let resolver = resolver(MockFetcher::new(|_, _| page(200, "<html></html>")));

        let response = ask(&resolver, "7.xkcd.").await;
        assert_eq!(rcode(&response), ResponseCode::ServFail);
        assert!(resolver.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_response_packet_dropped() {
        let resolver = resolver(MockFetcher::serving(1, "a", "b"));
        let mut query = builder::build_query("1.xkcd", RecordType::TXT, 1);
        builder::mark_as_response(&mut query);

        assert!(handle_dns_query(&resolver, &query, client(), ZONE, false)
            .await
            .is_none());
        assert_eq!(resolver.fetcher().calls(), 0);
    }

    #[tokio::test]
    async fn test_multiple_questions_dropped() {
        let resolver = resolver(MockFetcher::serving(1, "a", "b"));
        let mut query = builder::build_query("1.xkcd", RecordType::TXT, 1);
        builder::set_question_count(&mut query, 2);

        assert!(handle_dns_query(&resolver, &query, client(), ZONE, false)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_malformed_packet_dropped() {
        let resolver = resolver(MockFetcher::serving(1, "a", "b"));

        assert!(handle_dns_query(&resolver, &[0x12, 0x34], client(), ZONE, false)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_query_type_ignored() {
        let resolver = resolver(MockFetcher::new(|_, _| page(200, &comic_page(5, "t", "a"))));
        let query = builder::build_query("title.5.xkcd", RecordType::A, 9);

        let response = handle_dns_query(&resolver, &query, client(), ZONE, false)
            .await
            .unwrap();
        assert_eq!(texts(&response), vec!["t"]);
    }

    #[tokio::test]
    async fn test_long_alt_text_sets_truncation_unless_edns_allows() {
        let alt = "a".repeat(600);
        let resolver = resolver(MockFetcher::new(move |_, _| page(200, &comic_page(9, "t", &alt))));

        let response = ask(&resolver, "alt.9.xkcd.").await;
        let parsed = DnsResponse::parse(&response).unwrap();
        assert!(response.len() <= 512);
        assert!(parsed.is_truncated());
        assert_eq!(parsed.answer_count(), 0);

        let mut query = builder::build_query("alt.9.xkcd.", RecordType::TXT, 2);
        builder::add_edns(&mut query, 1232);
        let response = handle_dns_query(&resolver, &query, client(), ZONE, false)
            .await
            .unwrap();
        let parsed = DnsResponse::parse(&response).unwrap();
        assert!(!parsed.is_truncated());
        assert_eq!(parsed.txt_answers().unwrap()[0].text.len(), 600);
    }

    #[tokio::test]
    async fn test_mixed_case_query_echoes_question_name() {
        let resolver = resolver(MockFetcher::serving(5, "t", "a"));

        let response = ask(&resolver, "Title.5.XKCD.").await;
        let answers = DnsResponse::parse(&response).unwrap().txt_answers().unwrap();
        assert_eq!(answers[0].name, "Title.5.XKCD.");
        assert_eq!(answers[0].text, "t");
    }
}
