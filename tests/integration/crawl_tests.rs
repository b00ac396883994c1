//! Integration tests for the crawler
//!
//! These tests use wiremock to serve registry pages and run the real HTTP
//! transport and site drivers through full crawls, with the cache in a
//! temporary directory.

use roster_sweep::config::{parse_config, Config};
use roster_sweep::output::{format_delimited, write_delimited};
use roster_sweep::sites::OVERFLOW_NOTICE;
use roster_sweep::{CrawlOrchestrator, ShardKey, SweepError};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a validated configuration pointing `site` at `base_url`
fn create_test_config(
    site: &str,
    base_url: &str,
    cache: &Path,
    keys: &[&str],
    alphabet: &str,
    depth: u32,
) -> Config {
    let keys: Vec<String> = keys.iter().map(|k| format!("\"{}\"", k)).collect();
    let content = format!(
        r#"
site = "{site}"
base-url = "{base_url}"

[crawler]
concurrency = "sequential"
max-subdivision-depth = {depth}
jitter-probability = 0.0

[retry]
delay-ms = 1
max-attempts = 2

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[cache]
root = '{cache}'

[output]
path = '{cache}/roster.csv'

[shards]
keys = [{keys}]
extension-alphabet = "{alphabet}"
"#,
        site = site,
        base_url = base_url,
        depth = depth,
        cache = cache.display(),
        keys = keys.join(", "),
        alphabet = alphabet,
    );
    parse_config(&content).expect("test config should be valid")
}

fn shard_keys(keys: &[&str]) -> Vec<ShardKey> {
    keys.iter().map(|k| ShardKey::new(*k).unwrap()).collect()
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}

fn oregon_page(page: u32, total: u32, rows: &[(&str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(bar, name)| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>Salem</td></tr>",
                bar, name
            )
        })
        .collect();
    format!(
        r#"<html><body>
<div class="pagingheader"><h3>Page {} of {}</h3></div>
<table id="tblResults"><thead><tr><th>Bar</th><th>Name</th><th>City</th></tr></thead>
<tbody>{}</tbody></table>
</body></html>"#,
        page, total, body
    )
}

const OREGON_MEMBER: &str = r#"<html><body>
<table id="tbl_member">
  <tr><td>Bar Number:</td><td id="mnum">1</td></tr>
  <tr><td>Status:</td><td id="mstatus">Active Member</td></tr>
  <tr><td>Phone:</td><td id="mphone">(503) 555-0100</td></tr>
</table>
</body></html>"#;

async fn mount_oregon(server: &MockServer) {
    let pages: [&[(&str, &str)]; 4] = [
        &[("101", "Adams, Amy"), ("102", "Allen, Al"), ("103", "Avery, Ann")],
        &[("201", "Baker, Ben"), ("202", "Bell, Bo"), ("203", "Brown, Bea")],
        &[("301", "Burke, Bill"), ("302", "Carter, Cy"), ("303", "Chen, Cam")],
        &[("401", "Cole, Cal"), ("402", "Davis, Dee"), ("403", "Diaz, Dan")],
    ];
    for (index, rows) in pages.iter().enumerate() {
        let page = index as u32 + 1;
        Mock::given(method("GET"))
            .and(path("/members/membersearch.asp"))
            .and(query_param("cp", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_string(oregon_page(page, 4, rows)))
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/members/membersearch_display.asp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(OREGON_MEMBER))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_oregon_page_walk_crawl() {
    let server = MockServer::start().await;
    mount_oregon(&server).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config("oregon", &server.uri(), dir.path(), &["b", "c"], "ab", 2);

    let crawler = CrawlOrchestrator::from_config(&config).unwrap();
    let (table, report) = crawler.crawl(&shard_keys(&["b", "c"])).await.unwrap();

    let names: Vec<&str> = table
        .rows
        .iter()
        .map(|row| row.listing.get("name").map(String::as_str).unwrap_or_default())
        .collect();
    assert_eq!(
        names,
        vec![
            "Baker, Ben",
            "Bell, Bo",
            "Brown, Bea",
            "Burke, Bill",
            "Carter, Cy",
            "Chen, Cam",
            "Cole, Cal"
        ]
    );
    assert!(table
        .rows
        .iter()
        .all(|row| row.detail_field("status") == Some("Active Member")));
    assert_eq!(
        table.rows[0].identifier,
        format!("{}/members/membersearch_display.asp?b=201", server.uri())
    );
    assert_eq!(report.shards, 2);
    assert_eq!(report.detail_records, 7);
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    let server = MockServer::start().await;
    mount_oregon(&server).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config("oregon", &server.uri(), dir.path(), &["b", "c"], "ab", 2);
    let shards = shard_keys(&["b", "c"]);

    let (first, _) = CrawlOrchestrator::from_config(&config)
        .unwrap()
        .crawl(&shards)
        .await
        .unwrap();
    let requests = request_count(&server).await;
    assert!(requests > 0);

    // A fresh orchestrator over the same cache directory
    let (second, report) = CrawlOrchestrator::from_config(&config)
        .unwrap()
        .crawl(&shards)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(request_count(&server).await, requests);
    assert_eq!(report.shards_from_cache, 2);
    assert!(report.details_from_cache);
    assert!(dir.path().join("oregon").join("shard-b.json").exists());
}

#[tokio::test]
async fn test_output_file_matches_table() {
    let server = MockServer::start().await;
    mount_oregon(&server).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config("oregon", &server.uri(), dir.path(), &["c"], "ab", 2);

    let (table, _) = CrawlOrchestrator::from_config(&config)
        .unwrap()
        .crawl(&shard_keys(&["c"]))
        .await
        .unwrap();
    let output = Path::new(&config.output.path);
    write_delimited(&table, output, ',').unwrap();

    let written = std::fs::read_to_string(output).unwrap();
    assert_eq!(written, format_delimited(&table, ','));
    assert!(written.starts_with("identifier,bar_num,city,name,phone,status\n"));
    assert_eq!(written.lines().count(), 1 + 3);
}

#[tokio::test]
async fn test_bounded_retry_failure_names_shard() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/members/membersearch.asp"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config("oregon", &server.uri(), dir.path(), &["b"], "ab", 2);

    let result = CrawlOrchestrator::from_config(&config)
        .unwrap()
        .crawl(&shard_keys(&["b"]))
        .await;

    match result {
        Err(SweepError::Shard { shard, .. }) => assert_eq!(shard, "b"),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("crawl should fail"),
    }
    // max-attempts = 2
    assert_eq!(request_count(&server).await, 2);
}

fn california_results(rows: &[(&str, &str, &str)], overflow: bool) -> String {
    let notice = if overflow {
        format!("<p><strong>{}</strong></p>", OVERFLOW_NOTICE)
    } else {
        String::new()
    };
    let body: String = rows
        .iter()
        .map(|(href, name, status)| {
            format!(
                "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>Oakland</td></tr>",
                href, name, status
            )
        })
        .collect();
    format!(
        r#"<html><body>{}
<table id="tblAttorney"><thead><tr><th>Name</th><th>Status</th><th>City</th></tr></thead>
<tbody>{}</tbody></table></body></html>"#,
        notice, body
    )
}

const CALIFORNIA_EMPTY: &str = "<html><body><p>No results</p></body></html>";

fn california_detail(email: &str) -> String {
    format!(
        r#"<html><head><style>#e0{{display:none;}} #e1{{display:inline;}}</style></head><body>
<div id="moduleMemberDetail">
  <p>Address: 1 Main St, Oakland, CA</p>
  <p>Phone: 510-555-0100 | Fax: 510-555-0199</p>
  <span id="e0">decoy@example.com</span>
  <span id="e1">{}</span>
</div></body></html>"#,
        email
    )
}

async fn mount_search(server: &MockServer, term: &str, body: String) {
    Mock::given(method("GET"))
        .and(path("/attorney/LicenseeSearch/QuickSearch"))
        .and(query_param("FreeText", term))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_search_fallback(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/attorney/LicenseeSearch/QuickSearch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CALIFORNIA_EMPTY))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_california_subdivides_overflowing_shard() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        "a",
        california_results(&[("/Licensee/Detail/1", "Aaron, Amy", "Active")], true),
    )
    .await;
    mount_search(
        &server,
        "aa",
        california_results(
            &[
                ("/Licensee/Detail/1", "Aaron, Amy", "Active"),
                ("/Licensee/Detail/2", "Aaronson, Al", "Judge"),
            ],
            false,
        ),
    )
    .await;
    mount_search(
        &server,
        "ab",
        california_results(
            &[
                ("/Licensee/Detail/3", "Abbott, Ann", "Active"),
                ("/Licensee/Detail/4", "Abel, Abe", "Deceased"),
            ],
            false,
        ),
    )
    .await;
    mount_search_fallback(&server).await;

    for (id, email) in [("1", "amy@example.com"), ("3", "ann@example.com")] {
        Mock::given(method("GET"))
            .and(path(format!("/Licensee/Detail/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_string(california_detail(email)))
            .expect(1)
            .mount(&server)
            .await;
    }
    for id in ["2", "4"] {
        Mock::given(method("GET"))
            .and(path(format!("/Licensee/Detail/{}", id)))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let config = create_test_config("california", &server.uri(), dir.path(), &["a"], "ab", 2);
    let (table, report) = CrawlOrchestrator::from_config(&config)
        .unwrap()
        .crawl(&shard_keys(&["a"]))
        .await
        .unwrap();

    let ids: Vec<&str> = table.rows.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "/Licensee/Detail/1",
            "/Licensee/Detail/2",
            "/Licensee/Detail/3",
            "/Licensee/Detail/4"
        ]
    );
    assert_eq!(table.rows[0].detail_field("email"), Some("amy@example.com"));
    assert_eq!(table.rows[0].detail_field("phone"), Some("510-555-0100"));
    assert_eq!(table.rows[1].detail, None);
    assert_eq!(table.rows[2].detail_field("email"), Some("ann@example.com"));
    assert_eq!(table.rows[3].detail, None);

    assert_eq!(report.eligible_details, 2);
    assert!(report.is_complete());
    assert!(dir.path().join("california").join("term-ab.json").exists());
}

#[tokio::test]
async fn test_california_depth_limit_keeps_partial_rows() {
    let server = MockServer::start().await;
    // Every query overflows
    Mock::given(method("GET"))
        .and(path("/attorney/LicenseeSearch/QuickSearch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(california_results(
            &[("/Licensee/Detail/1", "Aaron, Amy", "Judge")],
            true,
        )))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config("california", &server.uri(), dir.path(), &["a"], "ab", 1);
    let (table, report) = CrawlOrchestrator::from_config(&config)
        .unwrap()
        .crawl(&shard_keys(&["a"]))
        .await
        .unwrap();

    assert_eq!(table.len(), 1);
    assert!(!report.is_complete());
    assert_eq!(
        report.exhausted_terms,
        vec!["aa", "ab", "a a", "a b"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );
    assert!(!dir.path().join("california").join("shard-a.json").exists());
}

#[tokio::test]
async fn test_blocked_subdivision_term_is_not_cached_as_empty() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        "a",
        california_results(&[("/Licensee/Detail/1", "Aaron, Amy", "Active")], true),
    )
    .await;
    mount_search(
        &server,
        "aa",
        california_results(&[("/Licensee/Detail/1", "Aaron, Amy", "Active")], false),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/attorney/LicenseeSearch/QuickSearch"))
        .and(query_param("FreeText", "ab"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Access denied"))
        .expect(2)
        .mount(&server)
        .await;
    mount_search_fallback(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config("california", &server.uri(), dir.path(), &["a"], "ab", 2);
    let result = CrawlOrchestrator::from_config(&config)
        .unwrap()
        .crawl(&shard_keys(&["a"]))
        .await;

    match result {
        Err(SweepError::Shard { shard, .. }) => assert_eq!(shard, "a"),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("crawl should fail"),
    }
    let cache = dir.path().join("california");
    assert!(cache.join("term-aa.json").exists());
    assert!(!cache.join("term-ab.json").exists());
    assert!(!cache.join("shard-a.json").exists());
}

const WASHINGTON_ROW_COUNT: &str = "dnn_ctr2972_DNNWebControlContainer_ctl00_lblRowCount";
const WASHINGTON_GRID: &str = "dnn_ctr2972_DNNWebControlContainer_ctl00_dg";

fn washington_page(total: usize, bar_nums: std::ops::Range<usize>) -> String {
    let rows: String = bar_nums
        .map(|bar| {
            format!(
                "<tr class=\"grid-row\"><td>{}</td><td>Bea{}</td><td>Young</td><td>Seattle</td><td>Active</td><td>206-555-0100</td></tr>",
                bar, bar
            )
        })
        .collect();
    format!(
        r#"<html><body>
<span id="{}">{} records found</span>
<table id="{}"><tr><th>Bar</th><th>First</th><th>Last</th><th>City</th><th>Status</th><th>Phone</th></tr>{}</table>
</body></html>"#,
        WASHINGTON_ROW_COUNT, total, WASHINGTON_GRID, rows
    )
}

const WASHINGTON_PROFILE: &str = r#"<html><body>
<div id="dnn_ctr2977_DNNWebControlContainer_ctl00_ContainerPanel">
  <span id="dnn_ctr2977_DNNWebControlContainer_ctl00_lblStatus">Active</span>
  <span id="dnn_ctr2977_DNNWebControlContainer_ctl00_lblWaAdmitDate">11/5/2001</span>
  <span id="dnn_ctr2977_DNNWebControlContainer_ctl00_lblEmail">bea@example.com</span>
</div></body></html>"#;

#[tokio::test]
async fn test_washington_reads_every_page_of_a_shard() {
    let server = MockServer::start().await;
    for (page, bars) in [(1, 1..21), (2, 21..23)] {
        Mock::given(method("GET"))
            .and(path("/personifyebusiness/LegalDirectory.aspx"))
            .and(query_param("FirstName", "b"))
            .and(query_param("Page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_string(washington_page(22, bars)))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/personifyebusiness/LegalDirectory/LegalProfile.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WASHINGTON_PROFILE))
        .expect(22)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config("washington", &server.uri(), dir.path(), &["b"], "ab", 2);
    let (table, report) = CrawlOrchestrator::from_config(&config)
        .unwrap()
        .crawl(&shard_keys(&["b"]))
        .await
        .unwrap();

    assert_eq!(table.len(), 22);
    assert_eq!(
        table.rows[0].identifier,
        format!(
            "{}/personifyebusiness/LegalDirectory/LegalProfile.aspx?Usr_ID=000000000001",
            server.uri()
        )
    );
    assert_eq!(table.rows[21].listing.get("first_name").map(String::as_str), Some("Bea22"));
    assert!(table
        .rows
        .iter()
        .all(|row| row.detail_field("admit_date") == Some("11/5/2001")));
    assert!(report.is_complete());
    assert!(dir.path().join("washington").join("shard-b.json").exists());
}
