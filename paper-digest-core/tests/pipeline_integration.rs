use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, TimeZone, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::tempdir;

use paper_digest_core::config::DigestConfig;
use paper_digest_core::contract::{
    GenerationError, GenerationRequest, MockPaperSource, MockTextGenerator, PaperRecord,
    SourceError,
};
use paper_digest_core::pipeline::{generate_digest, PipelineError};

const COMPRESSED: &str = "## Objective:\nFind X.\n\n## Method:\nUse Y.\n\n## Results:\nZ works.\n\n## Significance:\nIt matters.";

fn record(title: &str, id: &str) -> PaperRecord {
    PaperRecord {
        title: title.to_string(),
        published: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        summary: "abstract".to_string(),
        authors: vec!["A. Author".to_string()],
        pdf_url: Some(format!("http://arxiv.org/pdf/{id}")),
        arxiv_url: format!("http://arxiv.org/abs/{id}"),
    }
}

fn write_bundle(path: &Path, files: &[(&str, &str)]) {
    let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, body) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, body.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

fn config(root: &Path) -> DigestConfig {
    let mut config = DigestConfig::default();
    config.fetch.papers_dir = root.join("papers");
    config.output.newsletter_dir = root.join("newsletter");
    config.summarize.generate_section_prompts = false;
    fs::create_dir_all(&config.fetch.papers_dir).unwrap();
    config
}

/// A source whose search returns `records` and whose downloads point at
/// bundles already placed in the papers directory.
fn source_for(records: Vec<PaperRecord>) -> MockPaperSource {
    let mut source = MockPaperSource::new();
    source
        .expect_search()
        .return_once(move |_| Ok(records));
    source
        .expect_download_source()
        .returning(|record, dir, ext| Ok(dir.join(record.source_file_name(ext))));
    source
}

/// Section requests echo their content; compression requests return `compressed`.
fn echo_generator(
    compressed: &'static str,
    seen: Arc<Mutex<Vec<GenerationRequest>>>,
) -> MockTextGenerator {
    let mut generator = MockTextGenerator::new();
    generator.expect_generate().returning(move |req| {
        seen.lock().unwrap().push(req.clone());
        if req.max_tokens.is_some() {
            Ok(compressed.to_string())
        } else {
            Ok(format!("S:{}", req.user.trim()))
        }
    });
    generator
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 3).unwrap()
}

fn bundle_path(config: &DigestConfig, record: &PaperRecord) -> PathBuf {
    config
        .fetch
        .papers_dir
        .join(record.source_file_name(&config.fetch.extension))
}

#[tokio::test]
async fn excluded_sections_are_never_sent_and_order_is_kept() {
    let tmp = tempdir().unwrap();
    let config = config(tmp.path());
    let paper = record("Paper X", "2405.00001v1");
    write_bundle(
        &bundle_path(&config, &paper),
        &[
            (
                "main.tex",
                "\\documentclass{article}\n\\begin{document}\n\\input{intro}\n\\input{method}\n\\input{acknowledgements}\n\\input{results}\n\\end{document}",
            ),
            ("intro.tex", "intro text"),
            ("method.tex", "method text"),
            ("acknowledgements.tex", "thanks everyone"),
            ("results.tex", "results text"),
        ],
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let source = source_for(vec![paper]);
    let generator = echo_generator(COMPRESSED, seen.clone());

    let report = generate_digest(&config, &source, &generator, date())
        .await
        .unwrap();
    assert_eq!(report.processed.len(), 1);
    assert!(report.skipped.is_empty());

    let requests = seen.lock().unwrap();
    assert!(requests.iter().all(|r| !r.user.contains("thanks everyone")));
    let compress = requests.iter().find(|r| r.max_tokens.is_some()).unwrap();
    assert!(compress
        .user
        .ends_with("- S:intro text\n- S:method text\n- S:results text"));

    let md = fs::read_to_string(&report.written.markdown).unwrap();
    assert!(md.starts_with("# Weekly Machine Learning Research Highlights\n\n## Paper X\n\n"));
    assert!(md.contains("### Significance\n\nIt matters."));
    assert!(md.contains("arxiv: http://arxiv.org/abs/2405.00001v1\n\n---\n\n"));
}

#[tokio::test]
async fn math_definition_and_mixed_case_acknowledgements_are_excluded() {
    let tmp = tempdir().unwrap();
    let config = config(tmp.path());
    let paper = record("Paper M", "2405.00009v1");
    write_bundle(
        &bundle_path(&config, &paper),
        &[
            (
                "main.tex",
                "\\begin{document}\n\\input{math_definition}\n\\input{method}\n\\input{Acknowledgements}\n\\end{document}",
            ),
            ("math_definition.tex", "let x be a vector"),
            ("method.tex", "method text"),
            ("Acknowledgements.tex", "thanks everyone"),
        ],
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let source = source_for(vec![paper]);
    let generator = echo_generator(COMPRESSED, seen.clone());

    let report = generate_digest(&config, &source, &generator, date())
        .await
        .unwrap();
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].sections, 3);
    assert_eq!(report.processed[0].summarized, 1);

    let requests = seen.lock().unwrap();
    assert!(requests
        .iter()
        .all(|r| !r.user.contains("let x be a vector") && !r.user.contains("thanks everyone")));
    let compress = requests.iter().find(|r| r.max_tokens.is_some()).unwrap();
    assert!(compress.user.ends_with("- S:method text"));
}

#[tokio::test]
async fn root_without_includes_is_a_single_section() {
    let tmp = tempdir().unwrap();
    let config = config(tmp.path());
    let paper = record("Solo", "2405.00002v1");
    write_bundle(
        &bundle_path(&config, &paper),
        &[("src/paper.tex", "\\begin{document}\nAll in one.\n\\end{document}")],
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let source = source_for(vec![paper]);
    let generator = echo_generator(COMPRESSED, seen.clone());

    let report = generate_digest(&config, &source, &generator, date())
        .await
        .unwrap();
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].sections, 1);

    let section_requests = seen
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.max_tokens.is_none())
        .count();
    assert_eq!(section_requests, 1);
}

#[tokio::test]
async fn corrupt_bundle_is_skipped_and_run_continues() {
    let tmp = tempdir().unwrap();
    let config = config(tmp.path());
    let broken = record("Broken", "2405.00003v1");
    let good = record("Good", "2405.00004v1");
    fs::write(bundle_path(&config, &broken), b"this is not gzip").unwrap();
    write_bundle(&bundle_path(&config, &good), &[("main.tex", "body")]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let source = source_for(vec![broken, good]);
    let generator = echo_generator(COMPRESSED, seen);

    let report = generate_digest(&config, &source, &generator, date())
        .await
        .unwrap();
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].record.title, "Good");
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].title, "Broken");
    assert_eq!(report.skipped[0].stage, "archive");
    assert!(!config.fetch.papers_dir.join("Broken").exists());
}

#[tokio::test]
async fn missing_significance_is_still_included() {
    let tmp = tempdir().unwrap();
    let config = config(tmp.path());
    let paper = record("Partial", "2405.00005v1");
    write_bundle(&bundle_path(&config, &paper), &[("main.tex", "body")]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let source = source_for(vec![paper]);
    let generator = echo_generator(
        "## Objective:\nFind X.\n\n## Method:\nUse Y.\n\n## Results:\nZ works.",
        seen,
    );

    let report = generate_digest(&config, &source, &generator, date())
        .await
        .unwrap();
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].summary.significance, "");

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(report.written.json.unwrap()).unwrap()).unwrap();
    assert_eq!(json["papers"][0]["title"], "Partial");
    assert_eq!(json["papers"][0]["significance"], "");
}

#[tokio::test]
async fn generation_failures_skip_the_paper() {
    let tmp = tempdir().unwrap();
    let config = config(tmp.path());
    let paper = record("Offline", "2405.00006v1");
    write_bundle(&bundle_path(&config, &paper), &[("main.tex", "body")]);

    let source = source_for(vec![paper]);
    let mut generator = MockTextGenerator::new();
    generator
        .expect_generate()
        .returning(|_| Err(GenerationError::MissingCredential));

    let report = generate_digest(&config, &source, &generator, date())
        .await
        .unwrap();
    assert!(report.processed.is_empty());
    assert_eq!(report.skipped[0].stage, "summarize");

    let md = fs::read_to_string(&report.written.markdown).unwrap();
    assert_eq!(md, "# Weekly Machine Learning Research Highlights\n\n");
}

#[tokio::test]
async fn section_prompts_are_generated_once_per_id() {
    let tmp = tempdir().unwrap();
    let mut config = config(tmp.path());
    config.summarize.generate_section_prompts = true;
    let first = record("First", "2405.00007v1");
    let second = record("Second", "2405.00008v1");
    for paper in [&first, &second] {
        write_bundle(
            &bundle_path(&config, paper),
            &[
                ("main.tex", "\\input{intro}\n\\input{results}"),
                ("intro.tex", "intro"),
                ("results.tex", "results"),
            ],
        );
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let source = source_for(vec![first, second]);
    let generator = echo_generator(COMPRESSED, seen.clone());

    let report = generate_digest(&config, &source, &generator, date())
        .await
        .unwrap();
    assert_eq!(report.processed.len(), 2);

    let prompt_requests = seen
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.user.starts_with("Generate a prompt"))
        .count();
    assert_eq!(prompt_requests, 2);
}

#[tokio::test]
async fn search_failure_is_fatal() {
    let tmp = tempdir().unwrap();
    let config = config(tmp.path());
    let mut source = MockPaperSource::new();
    source
        .expect_search()
        .return_once(|_| Err(SourceError::Feed("bad feed".to_string())));
    let generator = MockTextGenerator::new();

    let err = generate_digest(&config, &source, &generator, date())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Search(_)));
}
