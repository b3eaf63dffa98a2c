//! End-to-end harvest tests against a mock result server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scholardock::browser::{BrowserDriver, BrowserLauncher};
use scholardock::{HarvestConfig, HarvestError, HarvestSession, HarvestState, SearchQuery};

const CAPTCHA_PAGE: &str = "<html><body><form>Our systems have detected unusual traffic from your computer network. Please show you're not a robot.</form></body></html>";

/// One result entry in index markup.
fn entry(title: &str, meta: &str, cited: u32) -> String {
    format!(
        r#"<div class="gs_r gs_or gs_scl">
             <div class="gs_ri">
               <h3 class="gs_rt"><a href="https://example.org/{slug}">{title}</a></h3>
               <div class="gs_a">{meta}</div>
               <div class="gs_rs">Snippet for {title}</div>
               <div class="gs_fl gs_flb"><a href="/scholar?cites=1">Cited by {cited}</a></div>
             </div>
           </div>"#,
        slug = title.to_lowercase().replace(' ', "-"),
        title = title,
        meta = meta,
        cited = cited,
    )
}

fn page(entries: &[String]) -> String {
    format!(
        "<html><body><div id=\"gs_res_ccl_mid\">{}</div></body></html>",
        entries.join("\n")
    )
}

fn numbered_page(first: usize, count: usize) -> String {
    let entries: Vec<String> = (first..first + count)
        .map(|i| entry(&format!("Paper {}", i), "A Author - Venue, 2020 - Pub", i as u32))
        .collect();
    page(&entries)
}

async fn mount_page(server: &MockServer, start: &str, body: String) {
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .and(query_param("start", start))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn forbid_page(server: &MockServer, start: &str) {
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .and(query_param("start", start))
        .respond_with(ResponseTemplate::new(200).set_body_string(numbered_page(900, 10)))
        .expect(0)
        .mount(server)
        .await;
}

/// Launcher that counts launches and serves a fixed body.
struct CountingLauncher {
    launches: AtomicUsize,
    body: Option<String>,
}

impl CountingLauncher {
    fn new(body: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            launches: AtomicUsize::new(0),
            body,
        })
    }

    fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

struct StaticDriver(Option<String>);

#[async_trait]
impl BrowserDriver for StaticDriver {
    async fn navigate(&mut self, _url: &str) -> scholardock::Result<()> {
        Ok(())
    }

    async fn read_element(&mut self, _xpath: &str) -> scholardock::Result<Option<String>> {
        Ok(self.0.clone())
    }

    async fn close(&mut self) -> scholardock::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl BrowserLauncher for CountingLauncher {
    fn is_available(&self) -> bool {
        true
    }

    async fn launch(&self) -> scholardock::Result<Box<dyn BrowserDriver>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StaticDriver(self.body.clone())))
    }
}

fn browser_config(server: &MockServer) -> HarvestConfig {
    let mut config = HarvestConfig::for_testing(&server.uri());
    config.browser.enabled = true;
    config
}

fn session_with(
    config: HarvestConfig,
    launcher: &Arc<CountingLauncher>,
) -> HarvestSession {
    let launcher: Arc<dyn BrowserLauncher> = launcher.clone();
    HarvestSession::with_launcher(config, Some(launcher)).expect("session")
}

#[tokio::test]
async fn test_single_clean_page_returns_records_in_order() {
    let server = MockServer::start().await;
    let body = page(&[
        entry("Alpha study", "AB Cole, CD Dale - Journal of X, 2019 - Springer", 42),
        entry("Beta study", "E Fox - Journal of Y, 2021 - Elsevier", 7),
        entry("Gamma study", "G Hill - arxiv.org", 0),
    ]);
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .and(query_param("start", "0"))
        .and(query_param("q", "test"))
        .and(query_param("hl", "en"))
        .and(query_param("as_sdt", "0,5"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let launcher = CountingLauncher::new(None);
    let mut session = session_with(browser_config(&server), &launcher);
    let query = SearchQuery::new("test", 10, None, None).expect("query");

    let records = session.search(&query).await.expect("search");
    session.close().await;

    let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Alpha study", "Beta study", "Gamma study"]);
    assert_eq!(records[0].citations, 42);
    assert_eq!(records[0].year, Some(2019));
    assert_eq!(records[0].publisher, "Springer");
    assert_eq!(records[2].venue, "Venue not found");
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn test_paginates_until_target_and_stops_mid_page() {
    let server = MockServer::start().await;
    mount_page(&server, "0", numbered_page(1, 10)).await;
    mount_page(&server, "10", numbered_page(11, 10)).await;
    forbid_page(&server, "20").await;

    let query = SearchQuery::new("test", 15, Some(2015), None).expect("query");
    let records = HarvestSession::run(HarvestConfig::for_testing(&server.uri()), &query)
        .await
        .expect("search");

    assert_eq!(records.len(), 15);
    assert_eq!(records[0].title, "Paper 1");
    assert_eq!(records[14].title, "Paper 15");
}

#[tokio::test]
async fn test_empty_page_terminates_run_below_target() {
    let server = MockServer::start().await;
    mount_page(&server, "0", numbered_page(1, 10)).await;
    mount_page(&server, "10", page(&[])).await;
    forbid_page(&server, "20").await;
    forbid_page(&server, "30").await;

    let query = SearchQuery::new("test", 40, None, None).expect("query");
    let records = HarvestSession::run(HarvestConfig::for_testing(&server.uri()), &query)
        .await
        .expect("search");

    assert_eq!(records.len(), 10);
}

#[tokio::test]
async fn test_unbounded_target_pages_lazily() {
    let server = MockServer::start().await;
    mount_page(&server, "0", numbered_page(1, 10)).await;
    mount_page(&server, "10", page(&[])).await;
    forbid_page(&server, "20").await;

    let query = SearchQuery {
        keyword: "test".to_string(),
        num_results: usize::MAX,
        start_year: None,
        end_year: None,
    };
    let records = HarvestSession::run(HarvestConfig::for_testing(&server.uri()), &query)
        .await
        .expect("search");

    assert_eq!(records.len(), 10);
}

#[tokio::test]
async fn test_cookies_persist_across_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .and(query_param("start", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "GSP=abc; Path=/")
                .set_body_string(page(&[entry("First page", "A Author - Venue, 2020 - Pub", 1)])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .and(query_param("start", "10"))
        .and(header("cookie", "GSP=abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page(&[entry("Second page", "A Author - Venue, 2020 - Pub", 1)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let query = SearchQuery::new("test", 20, None, None).expect("query");
    let records = HarvestSession::run(HarvestConfig::for_testing(&server.uri()), &query)
        .await
        .expect("search");

    let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["First page", "Second page"]);
}

#[tokio::test]
async fn test_fetch_failure_skips_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_page(&server, "10", numbered_page(11, 10)).await;

    let query = SearchQuery::new("test", 20, None, None).expect("query");
    let records = HarvestSession::run(HarvestConfig::for_testing(&server.uri()), &query)
        .await
        .expect("search");

    assert_eq!(records.len(), 10);
    assert_eq!(records[0].title, "Paper 11");
}

#[tokio::test]
async fn test_blocked_page_without_browser_is_skipped() {
    let server = MockServer::start().await;
    mount_page(&server, "0", CAPTCHA_PAGE.to_string()).await;
    mount_page(&server, "10", numbered_page(11, 3)).await;

    let query = SearchQuery::new("test", 20, None, None).expect("query");
    let records = HarvestSession::run(HarvestConfig::for_testing(&server.uri()), &query)
        .await
        .expect("search");

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].title, "Paper 11");
}

#[tokio::test]
async fn test_blocked_page_uses_browser_content() {
    let server = MockServer::start().await;
    mount_page(&server, "0", CAPTCHA_PAGE.to_string()).await;
    mount_page(&server, "10", CAPTCHA_PAGE.to_string()).await;

    let launcher = CountingLauncher::new(Some(numbered_page(1, 10)));
    let mut session = session_with(browser_config(&server), &launcher);
    let query = SearchQuery::new("test", 20, None, None).expect("query");

    let records = session.search(&query).await.expect("search");
    session.close().await;

    assert_eq!(records.len(), 20);
    assert_eq!(launcher.launches(), 1);
}

#[tokio::test]
async fn test_discarded_titles_never_returned() {
    let server = MockServer::start().await;
    let body = page(&[
        entry("Could not catch title", "A - B, 2020 - C", 1),
        entry("Kept", "A Author - B, 2020 - C", 1),
        r#"<div class="gs_r gs_or gs_scl"><div class="gs_a">No heading - B, 2020 - C</div></div>"#
            .to_string(),
    ]);
    mount_page(&server, "0", body).await;

    let query = SearchQuery::new("test", 10, None, None).expect("query");
    let records = HarvestSession::run(HarvestConfig::for_testing(&server.uri()), &query)
        .await
        .expect("search");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Kept");
}

#[tokio::test]
async fn test_cancel_during_page_pause() {
    let server = MockServer::start().await;
    mount_page(&server, "0", numbered_page(1, 10)).await;
    forbid_page(&server, "10").await;

    let mut config = HarvestConfig::for_testing(&server.uri());
    config.page_delay = Duration::from_secs(3600);
    let mut session = HarvestSession::with_launcher(config, None).expect("session");
    let control = session.control();
    let mut states = control.subscribe();

    let watcher = tokio::spawn(async move {
        states
            .wait_for(|s| matches!(s, HarvestState::Pausing { .. }))
            .await
            .map(|_| ())
            .expect("state channel closed");
        control.cancel();
    });

    let query = SearchQuery::new("test", 30, None, None).expect("query");
    let records = tokio::time::timeout(Duration::from_secs(10), session.search(&query))
        .await
        .expect("cancel should end the pause")
        .expect("search");
    watcher.await.expect("watcher panicked");

    assert_eq!(records.len(), 10);
    assert_eq!(session.control().state(), HarvestState::Finished { count: 10 });

    // Stays cancelled until reset.
    let again = session.search(&query).await.expect("search");
    assert!(again.is_empty());
    session.close().await;
}

#[tokio::test]
async fn test_debug_html_dumped_when_first_page_empty() {
    let server = MockServer::start().await;
    mount_page(&server, "0", "<html><body>nothing here</body></html>".to_string()).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let dump = dir.path().join("debug_scholar.html");
    let mut config = HarvestConfig::for_testing(&server.uri());
    config.debug_html_path = Some(dump.clone());

    let query = SearchQuery::new("test", 10, None, None).expect("query");
    let records = HarvestSession::run(config, &query).await.expect("search");

    assert!(records.is_empty());
    let saved = std::fs::read_to_string(&dump).expect("debug dump");
    assert!(saved.contains("nothing here"));
}

#[tokio::test]
async fn test_probe_reports_block_and_entries() {
    let server = MockServer::start().await;
    mount_page(&server, "0", numbered_page(1, 4)).await;
    mount_page(&server, "10", CAPTCHA_PAGE.to_string()).await;

    let session = HarvestSession::with_launcher(HarvestConfig::for_testing(&server.uri()), None)
        .expect("session");

    let clean = session
        .probe(&format!("{}/scholar?start=0&q=test", server.uri()))
        .await
        .expect("probe");
    assert!(!clean.blocked);
    assert_eq!(clean.entries, 4);

    let blocked = session
        .probe(&format!("{}/scholar?start=10&q=test", server.uri()))
        .await
        .expect("probe");
    assert!(blocked.blocked);
    assert_eq!(blocked.entries, 0);

    assert!(matches!(
        session.probe("not a url").await,
        Err(HarvestError::Validation(_))
    ));
    session.close().await;
}

#[tokio::test]
async fn test_rate_limit_surfaces_through_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
        .mount(&server)
        .await;

    let session = HarvestSession::with_launcher(HarvestConfig::for_testing(&server.uri()), None)
        .expect("session");
    let result = session.probe(&format!("{}/scholar?q=test", server.uri())).await;
    assert!(matches!(result, Err(HarvestError::RateLimited(120))));
    session.close().await;
}
