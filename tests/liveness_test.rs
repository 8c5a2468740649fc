//! End-to-end liveness runs against a local HTTP server.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use urlsift::liveness::{run_liveness, LivenessJob, LivenessOptions, LivenessOutcome, LivenessRun};
use urlsift::output::{render_report, ReportFormat};
use urlsift::prober::{Classification, HttpFetcher, ProbeConfig};
use urlsift::stage::{ForcePolicy, StageCache};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn html(title: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(format!(
        "<html><head><title>{}</title></head><body>content</body></html>",
        title
    ))
}

fn options() -> LivenessOptions {
    LivenessOptions {
        probe: ProbeConfig::new()
            .with_timeout(Duration::from_secs(5))
            .with_retries(3)
            .with_delay(Duration::ZERO),
        chunks: 2,
        ..LivenessOptions::default()
    }
}

fn write_candidates(dir: &Path, server: &MockServer, paths: &[&str]) -> std::path::PathBuf {
    let file = dir.join("candidates.txt");
    let lines: Vec<String> = paths.iter().map(|p| format!("{}{}", server.uri(), p)).collect();
    fs::write(&file, lines.join("\n") + "\n").unwrap();
    file
}

async fn probe(job: &LivenessJob, force: ForcePolicy) -> LivenessOutcome {
    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(5)).unwrap());
    run_liveness(job, fetcher, &StageCache::new(force), CancellationToken::new())
        .await
        .unwrap()
}

fn completed(outcome: LivenessOutcome) -> LivenessRun {
    match outcome {
        LivenessOutcome::Completed(run) => run,
        LivenessOutcome::Skipped => panic!("expected a completed run"),
    }
}

async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/alive"))
        .respond_with(html("Welcome"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<title>404</title>"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/soft"))
        .respond_with(html("Halaman Tidak Ditemukan"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_alive_real_and_soft_not_found() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let dir = TempDir::new().unwrap();
    let input = write_candidates(dir.path(), &server, &["/soft", "/gone", "/alive"]);
    let output = dir.path().join("alive.txt");

    let job = LivenessJob::new("probe", vec![input], Some(output.clone())).with_options(options());
    let run = completed(probe(&job, ForcePolicy::None).await);

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        format!("{}/alive\n", server.uri())
    );
    let classes: Vec<Classification> = run.merged.results.iter().map(|r| r.classification).collect();
    assert_eq!(
        classes,
        vec![
            Classification::SoftNotFound,
            Classification::RealNotFound,
            Classification::Alive
        ]
    );
    assert_eq!(run.summary.alive, 1);
    assert_eq!(run.summary.soft_not_found, 1);
    assert_eq!(run.summary.real_not_found, 1);
    assert!(run.merged.results.iter().all(|r| r.attempts == 1));
    assert!(!dir.path().join("alive.txt.unknown.jsonl").exists());
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;
    // Two empty responses, then the real page.
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(html("Dashboard"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let input = write_candidates(dir.path(), &server, &["/flaky"]);
    let job = LivenessJob::new("probe", vec![input], Some(dir.path().join("alive.txt")))
        .with_options(options());
    let run = completed(probe(&job, ForcePolicy::None).await);

    assert_eq!(run.merged.results.len(), 1);
    let result = &run.merged.results[0];
    assert_eq!(result.classification, Classification::Alive);
    assert_eq!(result.attempts, 3);
    assert!(result
        .diagnostic
        .as_deref()
        .is_some_and(|d| d.contains("empty response")));
}

#[tokio::test]
async fn test_exhausted_url_is_reported_unknown() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    Mock::given(method("GET"))
        .and(path("/blank"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let input = write_candidates(dir.path(), &server, &["/alive", "/blank"]);
    let output = dir.path().join("alive.txt");
    let job = LivenessJob::new("probe", vec![input], Some(output.clone())).with_options(options());
    let run = completed(probe(&job, ForcePolicy::None).await);

    assert_eq!(fs::read_to_string(&output).unwrap().lines().count(), 1);
    assert_eq!(run.summary.unknown, 1);

    let log = fs::read_to_string(dir.path().join("alive.txt.unknown.jsonl")).unwrap();
    let entry: serde_json::Value = serde_json::from_str(log.trim()).unwrap();
    assert_eq!(entry["url"], format!("{}/blank", server.uri()));
    assert_eq!(entry["classification"], "UNKNOWN");
    assert_eq!(entry["attempts"], 3);

    let csv = String::from_utf8(render_report(&run.merged, ReportFormat::Csv).unwrap()).unwrap();
    assert!(csv.lines().last().unwrap().contains(",UNKNOWN,,,3,"));
}

#[tokio::test]
async fn test_second_run_is_skipped_and_artifact_unchanged() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let dir = TempDir::new().unwrap();
    let input = write_candidates(dir.path(), &server, &["/alive", "/gone", "/soft"]);
    let output = dir.path().join("alive.txt");
    let job = LivenessJob::new("probe", vec![input], Some(output.clone())).with_options(options());

    completed(probe(&job, ForcePolicy::None).await);
    let first = fs::read(&output).unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(html("Welcome"))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = probe(&job, ForcePolicy::None).await;
    assert!(matches!(outcome, LivenessOutcome::Skipped));
    assert_eq!(fs::read(&output).unwrap(), first);
}

#[tokio::test]
async fn test_force_probes_again() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let dir = TempDir::new().unwrap();
    let input = write_candidates(dir.path(), &server, &["/alive", "/gone"]);
    let output = dir.path().join("alive.txt");
    let job = LivenessJob::new("probe", vec![input], Some(output.clone())).with_options(options());

    completed(probe(&job, ForcePolicy::None).await);
    let run = completed(probe(&job, ForcePolicy::All).await);

    assert_eq!(run.summary.candidates, 2);
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4);
}

#[tokio::test]
async fn test_host_lines_become_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("Index"))
        .mount(&server)
        .await;

    let address = server.address();
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("ports.txt");
    fs::write(&input, format!("{}\n{}\n\n", address, address)).unwrap();

    let job = LivenessJob::new("probe", vec![input], None).with_options(options());
    let run = completed(probe(&job, ForcePolicy::None).await);

    assert_eq!(run.summary.candidates, 1);
    assert_eq!(run.merged.alive, vec![format!("http://{}", address)]);
}
