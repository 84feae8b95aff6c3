//! End-to-end tests for the download pipeline.
//!
//! Separate mock servers stand in for OpenAlex, the publisher's PDF host and
//! the mirror, so each test can assert exactly which of them were contacted.

use std::time::Duration;

use doi2pdf::batch::{parse_identifiers, BatchRunner};
use doi2pdf::config::Config;
use doi2pdf::fetch::{build_http_client, PdfFetcher};
use doi2pdf::identifier::SourceKind;
use doi2pdf::mirror::html::HtmlStrategy;
use doi2pdf::mirror::{MirrorStrategy, StrategyKind};
use doi2pdf::pipeline::{Downloader, PdfSource, Stage};
use doi2pdf::ErrorKind;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{any, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PDF_BODY: &[u8] = b"%PDF-1.4\n%test document\n";

fn downloader(openalex: &MockServer, mirror: &MockServer, output: &TempDir) -> Downloader {
    let config = Config {
        output_dir: output.path().to_path_buf(),
        strategy: StrategyKind::PlainHttp,
        delay: Duration::ZERO,
        mirror_url: mirror.uri(),
        openalex_url: openalex.uri(),
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    Downloader::from_config(&config).expect("downloader")
}

async fn mount_work(openalex: &MockServer, doi: &str, title: &str, oa_url: Option<String>) {
    let body = json!({
        "id": "https://openalex.org/W1",
        "display_name": title,
        "doi": format!("https://doi.org/{}", doi),
        "open_access": { "oa_url": oa_url },
    });
    Mock::given(method("GET"))
        .and(path_regex(format!("^/works/https:/+doi.org/{}$", regex_escape(doi))))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(openalex)
        .await;
}

fn regex_escape(s: &str) -> String {
    s.replace('.', r"\.")
}

#[tokio::test]
async fn test_direct_pdf_skips_mirror() {
    let openalex = MockServer::start().await;
    let publisher = MockServer::start().await;
    let mirror = MockServer::start().await;
    let output = TempDir::new().expect("tempdir");

    mount_work(
        &openalex,
        "10.1234/example.doi",
        "An Example Paper",
        Some(format!("{}/files/example.pdf", publisher.uri())),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/files/example.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PDF_BODY.to_vec()))
        .expect(1)
        .mount(&publisher)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mirror)
        .await;

    let saved = downloader(&openalex, &mirror, &output)
        .download("https://doi.org/10.1234/example.doi", SourceKind::Doi)
        .await
        .expect("saved");

    assert_eq!(saved.source, PdfSource::Direct);
    assert_eq!(saved.path, output.path().join("An_Example_Paper.pdf"));
    assert_eq!(std::fs::read(&saved.path).expect("read"), PDF_BODY);
}

#[tokio::test]
async fn test_mirror_without_pdf_link_is_not_found() {
    let openalex = MockServer::start().await;
    let mirror = MockServer::start().await;
    let output = TempDir::new().expect("tempdir");

    mount_work(&openalex, "10.1234/nodirect.doi", "No Direct Link", None).await;
    Mock::given(method("GET"))
        .and(path("/10.1234/nodirect.doi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><div id=\"viewer\"></div><script src=\"/app.js\"></script></body></html>"),
        )
        .expect(1)
        .mount(&mirror)
        .await;

    let failure = downloader(&openalex, &mirror, &output)
        .download("10.1234/nodirect.doi", SourceKind::Doi)
        .await
        .expect_err("should fail");

    assert_eq!(failure.stage, Stage::FallbackAttempted);
    assert_eq!(failure.error.kind(), ErrorKind::NotFound);
    assert_eq!(std::fs::read_dir(output.path()).expect("dir").count(), 0);
}

#[tokio::test]
async fn test_mirror_fallback_downloads_embedded_pdf() {
    let openalex = MockServer::start().await;
    let mirror = MockServer::start().await;
    let output = TempDir::new().expect("tempdir");

    mount_work(&openalex, "10.1234/mirrored.doi", "Mirrored Paper", None).await;
    Mock::given(method("GET"))
        .and(path("/10.1234/mirrored.doi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><embed id=\"pdf\" src=\"/storage/mirrored.pdf#navpanes=0\"></body></html>",
        ))
        .mount(&mirror)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/mirrored.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PDF_BODY.to_vec()))
        .expect(1)
        .mount(&mirror)
        .await;

    let saved = downloader(&openalex, &mirror, &output)
        .download("doi:10.1234/mirrored.doi", SourceKind::Doi)
        .await
        .expect("saved");

    assert_eq!(saved.source, PdfSource::Mirror);
    assert_eq!(saved.path.file_name().and_then(|n| n.to_str()), Some("Mirrored_Paper.pdf"));
}

#[tokio::test]
async fn test_unknown_doi_fails_without_fallback() {
    let openalex = MockServer::start().await;
    let mirror = MockServer::start().await;
    let output = TempDir::new().expect("tempdir");

    Mock::given(any())
        .respond_with(ResponseTemplate::new(404))
        .mount(&openalex)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mirror)
        .await;

    let failure = downloader(&openalex, &mirror, &output)
        .download("10.1234/missing", SourceKind::Doi)
        .await
        .expect_err("should fail");

    assert_eq!(failure.stage, Stage::Normalized);
    assert_eq!(failure.error.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_title_search_resolves_and_downloads() {
    let openalex = MockServer::start().await;
    let publisher = MockServer::start().await;
    let mirror = MockServer::start().await;
    let output = TempDir::new().expect("tempdir");

    let body = json!({
        "meta": { "count": 1 },
        "results": [{
            "display_name": "Attention Is All You Need",
            "doi": "https://doi.org/10.5555/attention",
            "best_oa_location": { "pdf_url": format!("{}/attention.pdf", publisher.uri()) },
        }],
    });
    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("filter", "title.search:attention is all you need"))
        .and(query_param("per-page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&openalex)
        .await;
    Mock::given(method("GET"))
        .and(path("/attention.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PDF_BODY.to_vec()))
        .mount(&publisher)
        .await;

    let saved = downloader(&openalex, &mirror, &output)
        .download("attention is all you need", SourceKind::Name)
        .await
        .expect("saved");

    assert_eq!(saved.record.doi.as_deref(), Some("10.5555/attention"));
    assert_eq!(saved.path, output.path().join("Attention_Is_All_You_Need.pdf"));
}

#[tokio::test]
async fn test_same_title_twice_keeps_both_files() {
    let openalex = MockServer::start().await;
    let publisher = MockServer::start().await;
    let mirror = MockServer::start().await;
    let output = TempDir::new().expect("tempdir");

    mount_work(
        &openalex,
        "10.1234/dup.doi",
        "Duplicate",
        Some(format!("{}/dup.pdf", publisher.uri())),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/dup.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PDF_BODY.to_vec()))
        .expect(2)
        .mount(&publisher)
        .await;

    let d = downloader(&openalex, &mirror, &output);
    let first = d.download("10.1234/dup.doi", SourceKind::Doi).await.expect("first");
    let second = d.download("10.1234/dup.doi", SourceKind::Doi).await.expect("second");

    assert_eq!(first.path, output.path().join("Duplicate.pdf"));
    assert_eq!(second.path, output.path().join("Duplicate_1.pdf"));
    assert!(first.path.exists() && second.path.exists());
}

#[tokio::test]
async fn test_batch_continues_after_failure() {
    let openalex = MockServer::start().await;
    let publisher = MockServer::start().await;
    let mirror = MockServer::start().await;
    let output = TempDir::new().expect("tempdir");

    for (doi, title) in [("10.1234/one", "Paper One"), ("10.1234/three", "Paper Three")] {
        let file = format!("{}/{}.pdf", publisher.uri(), title.replace(' ', "-"));
        mount_work(&openalex, doi, title, Some(file)).await;
    }
    // Item 2 resolves but neither the publisher nor the mirror has it
    mount_work(&openalex, "10.1234/two", "Paper Two", None).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/Paper-(One|Three)\.pdf$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PDF_BODY.to_vec()))
        .mount(&publisher)
        .await;
    Mock::given(method("GET"))
        .and(path("/10.1234/two"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<p>Unfortunately, Sci-Hub doesn't have the requested document</p>",
        ))
        .mount(&mirror)
        .await;

    let d = downloader(&openalex, &mirror, &output);
    let items = parse_identifiers("10.1234/one\n# skipped\n10.1234/two\n\n10.1234/three\n");
    let summary = BatchRunner::new(Duration::ZERO).run(&d, items).await;

    assert_eq!(summary.saved(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.pauses, 2);
    let failed = summary
        .reports
        .iter()
        .find(|r| r.outcome.is_err())
        .expect("one failure");
    assert_eq!(failed.item.raw, "10.1234/two");
    assert!(output.path().join("Paper_One.pdf").exists());
    assert!(output.path().join("Paper_Three.pdf").exists());
}

#[tokio::test]
async fn test_title_with_commas_sends_single_filter() {
    let openalex = MockServer::start().await;
    let publisher = MockServer::start().await;
    let mirror = MockServer::start().await;
    let output = TempDir::new().expect("tempdir");

    let body = json!({
        "results": [{
            "display_name": "Deep learning, a review",
            "open_access": { "oa_url": format!("{}/review.pdf", publisher.uri()) },
        }],
    });
    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("filter", "title.search:Deep learning a review"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&openalex)
        .await;
    Mock::given(method("GET"))
        .and(path("/review.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PDF_BODY.to_vec()))
        .mount(&publisher)
        .await;

    let saved = downloader(&openalex, &mirror, &output)
        .download("Deep learning, a review", SourceKind::Name)
        .await
        .expect("saved");

    assert_eq!(saved.path, output.path().join("Deep_learning,_a_review.pdf"));
}

#[tokio::test]
async fn test_title_search_without_results_is_not_found() {
    let openalex = MockServer::start().await;
    let mirror = MockServer::start().await;
    let output = TempDir::new().expect("tempdir");

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "meta": { "count": 0 }, "results": [] })),
        )
        .expect(1)
        .mount(&openalex)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mirror)
        .await;

    let failure = downloader(&openalex, &mirror, &output)
        .download("a title nobody ever wrote", SourceKind::Name)
        .await
        .expect_err("should fail");

    assert_eq!(failure.stage, Stage::Normalized);
    assert_eq!(failure.error.kind(), ErrorKind::NotFound);
}

fn html_strategy(mirror: &MockServer) -> HtmlStrategy {
    let client = build_http_client(None, Duration::from_secs(5)).expect("client");
    HtmlStrategy::new(client.clone(), PdfFetcher::new(client), &mirror.uri())
}

#[tokio::test]
async fn test_mirror_refusal_statuses_are_blocked() {
    let mirror = MockServer::start().await;
    for (doi, status) in [("10.1234/s403", 403), ("10.1234/s429", 429), ("10.1234/s503", 503)] {
        Mock::given(method("GET"))
            .and(path(format!("/{}", doi)))
            .respond_with(ResponseTemplate::new(status))
            .mount(&mirror)
            .await;
    }

    let strategy = html_strategy(&mirror);
    for doi in ["10.1234/s403", "10.1234/s429", "10.1234/s503"] {
        let err = strategy.retrieve(doi).await.expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::BlockedByAntiBot, "{}", doi);
    }
}

#[tokio::test]
async fn test_mirror_challenge_page_is_blocked() {
    let mirror = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/10.1234/challenged"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>DDoS-Guard</title></head><body>Checking your browser before accessing</body></html>",
        ))
        .mount(&mirror)
        .await;

    let err = html_strategy(&mirror)
        .retrieve("10.1234/challenged")
        .await
        .expect_err("should fail");
    assert_eq!(err.kind(), ErrorKind::BlockedByAntiBot);
}
