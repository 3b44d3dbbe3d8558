use std::fs;

use chrono::NaiveDate;
use tempfile::tempdir;

use paper_digest_core::config::OutputConfig;
use paper_digest_core::digest::digest_path;
use paper_digest_core::publish::{
    default_markup_rules, publish_newsletter, render_digest, PublishError,
};

fn output_in(dir: &std::path::Path) -> OutputConfig {
    OutputConfig {
        newsletter_dir: dir.to_path_buf(),
        ..OutputConfig::default()
    }
}

#[test]
fn test_single_block_renders_one_details_element() {
    let md = "## Paper X\n\nbody\n\narxiv: http://arxiv.org/abs/1\n\n---\n\n";
    let html = render_digest(
        md,
        "Weekly",
        &OutputConfig::default().publish,
        "2024-05-03",
        &default_markup_rules(),
    )
    .unwrap();

    assert_eq!(html.matches("<details>").count(), 1);
    assert!(html.contains("<summary>Paper X</summary>"));
    assert!(html.contains("<p>body</p>"));
    assert!(html.contains(r#"<a href="http://arxiv.org/abs/1" target="_blank">ArXiv Link</a>"#));
    assert!(!html.contains("arxiv: http"));
    assert!(html.contains("<h1>Weekly</h1>"));
    assert!(html.contains("updated: 2024-05-03"));
}

#[test]
fn test_publish_writes_dated_page() {
    let tmp = tempdir().unwrap();
    let output = output_in(tmp.path());
    let date = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();

    let source = digest_path(tmp.path(), date, "md");
    fs::create_dir_all(source.parent().unwrap()).unwrap();
    fs::write(
        &source,
        "# Weekly Picks\n\n## Paper X\n\n### Objective\n\nFind **X**.\n\narxiv: http://arxiv.org/abs/1\n\n---\n\n## Paper Y\n\n### Objective\n\nFind *Y*.\n\narxiv: http://arxiv.org/abs/2\n\n---\n\n",
    )
    .unwrap();

    let page = publish_newsletter(&output, date).unwrap();
    assert_eq!(
        page,
        tmp.path().join("html").join("final_newsletter_2024-05-03.html")
    );

    let html = fs::read_to_string(page).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert_eq!(html.matches("<details>").count(), 2);
    assert!(html.contains("<h1>Weekly Picks</h1>"));
    assert!(html.contains("Find <strong>X</strong>."));
    assert!(html.contains("Find <em>Y</em>."));
    assert!(html.contains("styles.css"));
    assert!(!html.contains("<summary>Weekly Picks</summary>"));
}

#[test]
fn test_missing_digest_writes_nothing() {
    let tmp = tempdir().unwrap();
    let output = output_in(tmp.path());
    let date = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();

    let err = publish_newsletter(&output, date).unwrap_err();
    assert!(matches!(err, PublishError::MissingDigest { .. }));
    assert!(!tmp.path().join("html").exists());
}
