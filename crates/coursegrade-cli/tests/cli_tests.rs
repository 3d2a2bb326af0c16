//! CLI integration tests using assert_cmd.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn coursegrade() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("coursegrade").unwrap();
    cmd.env_remove("COURSEGRADE_WEIGHTING")
        .env_remove("COURSEGRADE_OUTPUT_DIR");
    cmd
}

const RUST_BASICS: &str = "../../catalogs/rust-basics.toml";

/// The single JSON report written into `dir`.
fn written_report(dir: &Path) -> PathBuf {
    let reports: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    assert_eq!(reports.len(), 1, "expected one report in {}", dir.display());
    reports[0].clone()
}

#[test]
fn validate_valid_catalog() {
    coursegrade()
        .arg("validate")
        .arg("--catalog")
        .arg(RUST_BASICS)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Catalog: Rust Basics (1 courses, 3 questions, 3 submissions)",
        ))
        .stdout(predicate::str::contains("All catalogs valid"));
}

#[test]
fn validate_directory() {
    coursegrade()
        .arg("validate")
        .arg("--catalog")
        .arg("../../catalogs")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rust Basics"))
        .stdout(predicate::str::contains("SQL Fundamentals"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("warn.toml");
    std::fs::write(
        &path,
        r#"
[catalog]
id = "warn"
name = "Warnings"

[[courses]]
key = "empty"
name = "Empty course"

[[courses]]
key = "broken"
name = "Broken course"

[[courses.questions]]
key = "q"
text = "Nothing is right"

[[courses.questions.choices]]
key = "a"
text = "A"
"#,
    )
    .unwrap();

    coursegrade()
        .arg("validate")
        .arg("--catalog")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[Empty course] WARNING"))
        .stdout(predicate::str::contains("no correct choices"))
        .stdout(predicate::str::contains("2 warning(s) found"));
}

#[test]
fn validate_nonexistent_file() {
    coursegrade()
        .arg("validate")
        .arg("--catalog")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn validate_rejects_foreign_answer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("foreign.toml");
    std::fs::write(
        &path,
        r#"
[catalog]
id = "foreign"
name = "Foreign"

[[courses]]
key = "a"

[[courses.questions]]
key = "qa"
text = "A?"

[[courses.questions.choices]]
key = "qa-yes"
correct = true

[[courses]]
key = "b"

[[enrollments]]
key = "e"
account = "x"
course = "b"

[[submissions]]
key = "s"
enrollment = "e"

[[submissions.answers]]
question = "qa"
choices = ["qa-yes"]
"#,
    )
    .unwrap();

    coursegrade()
        .arg("validate")
        .arg("--catalog")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("submission 's', question 'qa'"));
}

#[test]
fn grade_prints_summary() {
    coursegrade()
        .arg("grade")
        .arg("--catalog")
        .arg(RUST_BASICS)
        .arg("--no-save")
        .assert()
        .success()
        .stdout(predicate::str::contains("ana-1"))
        .stdout(predicate::str::contains("100.0%"))
        .stdout(predicate::str::contains("PASS"))
        .stdout(predicate::str::contains("38.9%"))
        .stdout(predicate::str::contains("33.3%"))
        .stdout(predicate::str::contains("FAIL (< 70%)"));
}

#[test]
fn grade_weighted() {
    coursegrade()
        .arg("grade")
        .arg("--catalog")
        .arg(RUST_BASICS)
        .arg("--weighting")
        .arg("weighted")
        .arg("--no-save")
        .assert()
        .success()
        .stdout(predicate::str::contains("weighting: weighted"))
        .stdout(predicate::str::contains("29.2%"))
        .stdout(predicate::str::contains("25.0%"));
}

#[test]
fn grade_rejects_unknown_weighting() {
    coursegrade()
        .arg("grade")
        .arg("--catalog")
        .arg(RUST_BASICS)
        .arg("--weighting")
        .arg("heavy")
        .arg("--no-save")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown weighting"));
}

#[test]
fn grade_rejects_unknown_format() {
    let dir = TempDir::new().unwrap();

    coursegrade()
        .arg("grade")
        .arg("--catalog")
        .arg(RUST_BASICS)
        .arg("--output")
        .arg(dir.path())
        .arg("--format")
        .arg("json,html")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format: 'html'"));

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn grade_writes_report() {
    let dir = TempDir::new().unwrap();

    coursegrade()
        .arg("grade")
        .arg("--catalog")
        .arg(RUST_BASICS)
        .arg("--output")
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Results saved to"));

    let report = std::fs::read_to_string(written_report(dir.path())).unwrap();
    assert!(report.contains("\"rust-basics\""));
    assert!(report.contains("\"ben-1\""));
}

#[test]
fn grade_uses_config_file() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let config = dir.path().join("coursegrade.toml");
    std::fs::write(
        &config,
        format!("weighting = \"weighted\"\noutput_dir = {:?}\n", out.display().to_string()),
    )
    .unwrap();

    coursegrade()
        .arg("grade")
        .arg("--catalog")
        .arg(RUST_BASICS)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("weighting: weighted"));

    assert!(written_report(&out).exists());
}

#[test]
fn check_partial_selection() {
    coursegrade()
        .arg("check")
        .arg("--catalog")
        .arg(RUST_BASICS)
        .arg("--question")
        .arg("derive")
        .arg("--choices")
        .arg("derive-clone,derive-copy")
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] Clone (correct)"))
        .stdout(predicate::str::contains("Fully correct: no"))
        .stdout(predicate::str::contains("Mark: 0.67"));
}

#[test]
fn check_superset_selection_scores() {
    coursegrade()
        .arg("check")
        .arg("--catalog")
        .arg(RUST_BASICS)
        .arg("--question")
        .arg("ints")
        .arg("--choices")
        .arg("ints-i32,ints-u8,ints-f64")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fully correct: yes"))
        .stdout(predicate::str::contains("Mark: 1.00"));
}

#[test]
fn check_rejects_foreign_choice() {
    coursegrade()
        .arg("check")
        .arg("--catalog")
        .arg(RUST_BASICS)
        .arg("--question")
        .arg("ints")
        .arg("--choices")
        .arg("borrow-one")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not belong"));
}

#[test]
fn questions_lists_course_questions() {
    coursegrade()
        .arg("questions")
        .arg("--catalog")
        .arg(RUST_BASICS)
        .arg("--enrollment")
        .arg("cy-rust")
        .assert()
        .success()
        .stdout(predicate::str::contains("cy in Rust 101 (3 questions)"))
        .stdout(predicate::str::contains("[weight 2, 1 of 3 choices correct]"))
        .stdout(predicate::str::contains("Submission cy-1:"))
        .stdout(predicate::str::contains("Which are integer types?: i32, u8"));
}

#[test]
fn questions_unknown_enrollment() {
    coursegrade()
        .arg("questions")
        .arg("--catalog")
        .arg(RUST_BASICS)
        .arg("--enrollment")
        .arg("nobody")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown enrollment key"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    coursegrade()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created coursegrade.toml"))
        .stdout(predicate::str::contains("Created catalogs/example.toml"));

    assert!(dir.path().join("coursegrade.toml").exists());
    assert!(dir.path().join("catalogs/example.toml").exists());

    // The starter files work together.
    coursegrade()
        .current_dir(dir.path())
        .arg("grade")
        .arg("--catalog")
        .arg("catalogs/example.toml")
        .arg("--no-save")
        .assert()
        .success()
        .stdout(predicate::str::contains("75.0%"))
        .stdout(predicate::str::contains("PASS"));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    coursegrade()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    coursegrade()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn compare_reports() {
    let dir = TempDir::new().unwrap();
    let baseline_dir = dir.path().join("baseline");
    let current_dir = dir.path().join("current");

    coursegrade()
        .args(["grade", "--catalog", RUST_BASICS, "--output"])
        .arg(&baseline_dir)
        .assert()
        .success();
    coursegrade()
        .args(["grade", "--catalog", RUST_BASICS, "--weighting", "weighted", "--output"])
        .arg(&current_dir)
        .assert()
        .success();

    let baseline = written_report(&baseline_dir);
    let current = written_report(&current_dir);

    coursegrade()
        .arg("compare")
        .arg("--baseline")
        .arg(&baseline)
        .arg("--current")
        .arg(&current)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 regressions"))
        .stdout(predicate::str::contains("1 unchanged"))
        .stdout(predicate::str::contains("ben-1 (rust-basics)"));

    coursegrade()
        .arg("compare")
        .arg("--baseline")
        .arg(&baseline)
        .arg("--current")
        .arg(&current)
        .arg("--fail-on-regression")
        .assert()
        .failure();

    coursegrade()
        .arg("compare")
        .arg("--baseline")
        .arg(&baseline)
        .arg("--current")
        .arg(&baseline)
        .arg("--format")
        .arg("markdown")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 regressions"));
}

#[test]
fn compare_nonexistent_report() {
    coursegrade()
        .arg("compare")
        .arg("--baseline")
        .arg("no_such_file.json")
        .arg("--current")
        .arg("also_no_file.json")
        .assert()
        .failure();
}

#[test]
fn help_output() {
    coursegrade()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Course catalog quiz grader"));
}

#[test]
fn version_output() {
    coursegrade()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("coursegrade"));
}
