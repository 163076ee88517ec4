//! Integration tests for the fetch/parse/storage pipeline.
//!
//! These drive the frontier, politeness enforcer, fetcher, parser, and
//! storage façades together against a mock HTTP server, the way a
//! single worker iteration in the orchestrator would. They require a
//! reachable KV service (Redis) and are skipped rather than failed
//! when `TEST_REDIS_URL` isn't set, matching the rest of the crate's
//! Redis-backed test suites.

use std::collections::HashSet;
use std::sync::Arc;
use sumi_ripple::config::UserAgentConfig;
use sumi_ripple::fetcher::{build_http_client, FetchOutcome, FetchType, Fetcher};
use sumi_ripple::frontier::FrontierManager;
use sumi_ripple::kvc::KvClient;
use sumi_ripple::parser::parse_html;
use sumi_ripple::politeness::PolitenessEnforcer;
use sumi_ripple::storage::{has_visited, StorageService};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_client() -> Option<KvClient> {
    let url = std::env::var("TEST_REDIS_URL").ok()?;
    KvClient::new(&url, 8).ok()
}

fn test_fetcher() -> Arc<Fetcher> {
    let config = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    };
    Arc::new(Fetcher::new(build_http_client(&config).unwrap(), 10))
}

#[tokio::test]
async fn test_claim_fetch_parse_record_roundtrip() {
    let Some(kvc) = test_client().await else { return };
    let data_dir = tempfile::TempDir::new().unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><head><title>Home</title></head><body>
                    <a href="/page1">Page 1</a>
                    <a href="/page2">Page 2</a>
                    </body></html>"#,
                )
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let host = server.address().to_string();
    let seed = format!("http://{}/", host);

    let frontier = FrontierManager::new(&kvc, data_dir.path());
    assert_eq!(frontier.add_seeds(&[seed]).await.unwrap(), 1);

    let claimed = frontier.claim().await.unwrap().expect("seed should be claimable");
    assert_eq!(claimed.host, host);
    assert_eq!(claimed.depth, 0);

    let politeness = PolitenessEnforcer::new(&kvc, test_fetcher(), "TestBot".to_string(), 0.0, HashSet::new());
    assert!(politeness.is_url_allowed(&claimed.url).await);

    let fetcher = test_fetcher();
    let outcome = fetcher.fetch(&claimed.url, &claimed.host, FetchType::Page).await;
    let FetchOutcome::Success { final_url, status_code, body, .. } = outcome else {
        panic!("expected a successful fetch, got {:?}", outcome);
    };
    assert_eq!(status_code, 200);

    let base = url::Url::parse(&final_url).unwrap();
    let parsed = parse_html(std::str::from_utf8(&body).unwrap(), &base).unwrap();
    assert_eq!(parsed.links.len(), 2);

    let added = frontier.add_urls(&parsed.links, claimed.depth).await.unwrap();
    assert_eq!(added, 2);

    let storage = StorageService::new(data_dir.path(), &kvc);
    storage
        .record_fetch(&claimed.url, &claimed.host, status_code, 0, Some(&body), None)
        .await
        .unwrap();
    assert!(has_visited(&kvc, &claimed.url).await.unwrap());

    frontier.release(&claimed.host, 0.0).await.unwrap();
    let next = frontier.claim().await.unwrap().expect("page1 or page2 should now be claimable");
    assert!(next.url.ends_with("/page1") || next.url.ends_with("/page2"));
    assert_eq!(next.depth, 1);
}

#[tokio::test]
async fn test_robots_txt_disallow_blocks_claimed_url() {
    let Some(kvc) = test_client().await else { return };

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin"))
        .mount(&server)
        .await;

    let host = server.address().to_string();
    let politeness = PolitenessEnforcer::new(&kvc, test_fetcher(), "TestBot".to_string(), 0.0, HashSet::new());

    let allowed_url = format!("http://{}/allowed", host);
    let blocked_url = format!("http://{}/admin/secret", host);
    assert!(politeness.is_url_allowed(&allowed_url).await);
    assert!(!politeness.is_url_allowed(&blocked_url).await);
}

#[tokio::test]
async fn test_excluded_domain_never_claimable() {
    let Some(kvc) = test_client().await else { return };
    let data_dir = tempfile::TempDir::new().unwrap();

    let frontier = FrontierManager::new(&kvc, data_dir.path());
    let seed = format!("https://excluded-{}.example.com/", std::process::id());
    assert_eq!(frontier.add_seeds(&[seed.clone()]).await.unwrap(), 1);

    let host = url::Url::parse(&seed).unwrap().host_str().unwrap().to_string();
    frontier.exclude(&host).await.unwrap();

    assert!(frontier.claim().await.unwrap().is_none());
}
