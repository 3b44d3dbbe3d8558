use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Writes a config whose newsletter directory lives inside `dir`.
fn create_config(dir: &TempDir) -> std::path::PathBuf {
    let config = dir.path().join("config.yaml");
    let yaml = format!(
        "fetch:\n  papers_dir: {papers}\noutput:\n  newsletter_dir: {newsletter}\n  write_json: false\n",
        papers = dir.path().join("papers").display(),
        newsletter = dir.path().join("newsletter").display(),
    );
    fs::write(&config, yaml).expect("Writing temp config failed");
    config
}

#[test]
fn publish_cli_renders_existing_digest() {
    let dir = TempDir::new().unwrap();
    let config = create_config(&dir);
    let digest_dir = dir.path().join("newsletter").join("2024");
    fs::create_dir_all(&digest_dir).unwrap();
    fs::write(
        digest_dir.join("n_2024-05-03.md"),
        "# Weekly\n\n## Paper X\n\nbody\n\narxiv: http://arxiv.org/abs/1\n\n---\n\n",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("paper-digest").expect("Binary exists");
    cmd.arg("publish")
        .arg("--config")
        .arg(&config)
        .arg("--date")
        .arg("2024-05-03")
        .env_remove("OPENAI_API_KEY");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Newsletter published"));

    let page = dir
        .path()
        .join("newsletter")
        .join("html")
        .join("final_newsletter_2024-05-03.html");
    let html = fs::read_to_string(page).expect("page written");
    assert!(html.contains("<summary>Paper X</summary>"));
}

#[test]
fn publish_cli_missing_digest_still_exits_zero() {
    let dir = TempDir::new().unwrap();
    let config = create_config(&dir);

    let mut cmd = Command::cargo_bin("paper-digest").expect("Binary exists");
    cmd.arg("publish")
        .arg("--config")
        .arg(&config)
        .arg("--date")
        .arg("2024-05-03");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Publishing failed"));
    assert!(!dir.path().join("newsletter").join("html").exists());
}

#[test]
fn binary_logs_its_own_startup_and_failure() {
    let dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("paper-digest").expect("Binary exists");
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .arg("generate")
        .arg("--config")
        .arg(dir.path().join("absent.yaml"));

    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("paper-digest starting without a .env file"))
        .stdout(predicate::str::contains("paper-digest run failed"));
}

#[test]
fn generate_cli_fails_on_missing_config() {
    let mut cmd = Command::cargo_bin("paper-digest").expect("Binary exists");
    cmd.arg("generate").arg("--config").arg("does-not-exist.yaml");
    cmd.assert().failure();
}

#[test]
fn cli_rejects_malformed_date() {
    let mut cmd = Command::cargo_bin("paper-digest").expect("Binary exists");
    cmd.arg("publish")
        .arg("--config")
        .arg("config.yaml")
        .arg("--date")
        .arg("03/05/2024");
    cmd.assert().failure();
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use paper_digest::cli::{run, Cli, Commands, RunArgs};

    // A dummy path: loading fails, but only after the first event.
    let cli = Cli {
        command: Commands::Publish(RunArgs {
            config: std::path::PathBuf::from("dummy.yaml"),
            date: None,
        }),
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
