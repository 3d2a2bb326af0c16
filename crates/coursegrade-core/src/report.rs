//! Grade report types with JSON persistence and baseline comparison.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::grading::{scorecard, GradingOptions, Scorecard};
use crate::model::Weighting;
use crate::repository::Repository;
use crate::statistics::{compute_aggregate_stats, AggregateStats};

/// A complete grading run over one or more catalogs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Weighting policy the grades were computed with.
    pub weighting: Weighting,
    /// One section per graded catalog.
    pub catalogs: Vec<CatalogReport>,
}

/// Grading results for a single catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogReport {
    pub id: String,
    pub name: String,
    pub course_count: usize,
    pub enrollment_count: usize,
    /// Scorecards keyed by submission key.
    pub submissions: Vec<ReportEntry>,
    /// Submissions that could not be scored at all.
    #[serde(default)]
    pub skipped: Vec<SkippedSubmission>,
    pub aggregate: AggregateStats,
}

/// A scored submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub key: String,
    pub scorecard: Scorecard,
}

impl ReportEntry {
    pub fn grade(&self) -> Option<f64> {
        self.scorecard.outcome.grade()
    }
}

/// A submission whose data violated an integrity rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedSubmission {
    pub key: String,
    pub reason: String,
}

impl CatalogReport {
    /// Score every submission of a catalog.
    pub fn build(catalog: &Catalog, options: &GradingOptions) -> Self {
        let store = &catalog.store;
        let mut submissions = Vec::new();
        let mut skipped = Vec::new();

        for sub in store.submissions() {
            let key = catalog
                .keys
                .submission_key(sub.id)
                .map(str::to_string)
                .unwrap_or_else(|| sub.id.to_string());
            match scorecard(store, sub.id, options) {
                Ok(card) => submissions.push(ReportEntry {
                    key,
                    scorecard: card,
                }),
                Err(e) => {
                    tracing::warn!("skipping submission {key} in {}: {e}", catalog.id);
                    skipped.push(SkippedSubmission {
                        key,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let cards: Vec<Scorecard> = submissions.iter().map(|e| e.scorecard.clone()).collect();
        let aggregate = compute_aggregate_stats(&cards);
        tracing::debug!(
            "catalog {}: {} scored, {} skipped",
            catalog.id,
            submissions.len(),
            skipped.len()
        );

        Self {
            id: catalog.id.clone(),
            name: catalog.name.clone(),
            course_count: store.courses().len(),
            enrollment_count: store.enrollments().count(),
            submissions,
            skipped,
            aggregate,
        }
    }
}

impl GradeReport {
    /// Grade every catalog with the given options.
    pub fn build(catalogs: &[Catalog], options: &GradingOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            weighting: options.weighting,
            catalogs: catalogs
                .iter()
                .map(|c| CatalogReport::build(c, options))
                .collect(),
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: GradeReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Total number of scored submissions.
    pub fn submission_count(&self) -> usize {
        self.catalogs.iter().map(|c| c.submissions.len()).sum()
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!(
            "# Grade report\n\n{} | weighting: {} | {} submissions\n\n",
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.weighting,
            self.submission_count()
        ));

        for catalog in &self.catalogs {
            md.push_str(&format!("## {} ({})\n\n", catalog.name, catalog.id));

            md.push_str("| Course | Submissions | Graded | Mean | Pass rate |\n");
            md.push_str("|--------|-------------|--------|------|-----------|\n");
            for c in &catalog.aggregate.per_course {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    c.course_name,
                    c.submissions,
                    c.graded,
                    percent(c.mean_grade),
                    percent(c.pass_rate)
                ));
            }
            md.push('\n');

            md.push_str("| Submission | Learner | Course | Grade | Result |\n");
            md.push_str("|------------|---------|--------|-------|--------|\n");
            for entry in &catalog.submissions {
                let card = &entry.scorecard;
                let result = match card.passed {
                    Some(true) => "pass",
                    Some(false) => "fail",
                    None => "not gradable",
                };
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    entry.key,
                    card.account,
                    card.course_name,
                    percent(entry.grade()),
                    result
                ));
            }
            md.push('\n');

            if !catalog.skipped.is_empty() {
                md.push_str("### Skipped\n\n");
                for s in &catalog.skipped {
                    md.push_str(&format!("- {}: {}\n", s.key, s.reason));
                }
                md.push('\n');
            }
        }

        md
    }

    /// Compare this report against a baseline.
    ///
    /// Submissions are matched by (catalog id, submission key). A submission
    /// that became not gradable counts as a regression, and one that became
    /// gradable counts as an improvement, regardless of `threshold`.
    pub fn compare(&self, baseline: &GradeReport, threshold: f64) -> ComparisonReport {
        let grade_map = |report: &GradeReport| -> HashMap<(String, String), Option<f64>> {
            report
                .catalogs
                .iter()
                .flat_map(|c| {
                    c.submissions
                        .iter()
                        .map(move |e| ((c.id.clone(), e.key.clone()), e.grade()))
                })
                .collect()
        };

        let baseline_grades = grade_map(baseline);
        let current_grades = grade_map(self);

        let mut regressions = Vec::new();
        let mut improvements = Vec::new();
        let mut unchanged = 0usize;
        let mut new_submissions = 0usize;

        let mut keys: Vec<_> = current_grades.keys().collect();
        keys.sort();

        for key in keys {
            let current = current_grades[key];
            let Some(&baseline_grade) = baseline_grades.get(key) else {
                new_submissions += 1;
                continue;
            };
            let change = GradeChange {
                catalog: key.0.clone(),
                submission: key.1.clone(),
                baseline_grade,
                current_grade: current,
                delta: current.unwrap_or(0.0) - baseline_grade.unwrap_or(0.0),
            };
            match (baseline_grade, current) {
                (Some(_), None) => regressions.push(change),
                (None, Some(_)) => improvements.push(change),
                (Some(_), Some(_)) if change.delta < -threshold => regressions.push(change),
                (Some(_), Some(_)) if change.delta > threshold => improvements.push(change),
                _ => unchanged += 1,
            }
        }

        let removed_submissions = baseline_grades
            .keys()
            .filter(|k| !current_grades.contains_key(k))
            .count();

        ComparisonReport {
            regressions,
            improvements,
            unchanged,
            new_submissions,
            removed_submissions,
        }
    }
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}%", v * 100.0))
}

/// Result of comparing two reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Submissions whose grade went down.
    pub regressions: Vec<GradeChange>,
    /// Submissions whose grade went up.
    pub improvements: Vec<GradeChange>,
    /// Submissions with no significant change.
    pub unchanged: usize,
    /// Submissions in current but not baseline.
    pub new_submissions: usize,
    /// Submissions in baseline but not current.
    pub removed_submissions: usize,
}

/// A grade change of one submission between two reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeChange {
    pub catalog: String,
    pub submission: String,
    pub baseline_grade: Option<f64>,
    pub current_grade: Option<f64>,
    pub delta: f64,
}

impl ComparisonReport {
    /// Format the comparison as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** {} regressions, {} improvements, {} unchanged, {} new, {} removed\n\n",
            self.regressions.len(),
            self.improvements.len(),
            self.unchanged,
            self.new_submissions,
            self.removed_submissions
        ));

        for (title, changes) in [
            ("Regressions", &self.regressions),
            ("Improvements", &self.improvements),
        ] {
            if changes.is_empty() {
                continue;
            }
            md.push_str(&format!("### {title}\n\n"));
            md.push_str("| Catalog | Submission | Baseline | Current | Delta |\n");
            md.push_str("|---------|------------|----------|---------|-------|\n");
            for c in changes {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {:+.1}% |\n",
                    c.catalog,
                    c.submission,
                    percent(c.baseline_grade),
                    percent(c.current_grade),
                    c.delta * 100.0
                ));
            }
            md.push('\n');
        }

        md
    }

    /// Returns true if there are any regressions.
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_catalog_str;

    const CATALOG: &str = r#"
[catalog]
id = "quiz"
name = "Quiz"

[[learners]]
account = "alice"

[[learners]]
account = "bob"

[[courses]]
key = "c"
name = "Basics"
passing_grade = 50

[[courses.questions]]
key = "q1"
text = "Pick the evens"

[[courses.questions.choices]]
key = "two"
text = "2"
correct = true

[[courses.questions.choices]]
key = "four"
text = "4"
correct = true

[[courses.questions.choices]]
key = "five"
text = "5"

[[courses.questions]]
key = "q2"
text = "Pick the odd"

[[courses.questions.choices]]
key = "seven"
text = "7"
correct = true

[[courses.questions.choices]]
key = "eight"
text = "8"

[[enrollments]]
key = "alice-c"
account = "alice"
course = "c"

[[enrollments]]
key = "bob-c"
account = "bob"
course = "c"

[[submissions]]
key = "alice-1"
enrollment = "alice-c"

[[submissions.answers]]
question = "q1"
choices = ["two", "four"]

[[submissions.answers]]
question = "q2"
choices = ["seven"]

[[submissions]]
key = "bob-1"
enrollment = "bob-c"

[[submissions.answers]]
question = "q1"
choices = ["two"]
"#;

    fn make_report() -> GradeReport {
        let catalog = parse_catalog_str(CATALOG, Path::new("quiz.toml")).unwrap();
        GradeReport::build(&[catalog], &GradingOptions::default())
    }

    fn entry<'a>(report: &'a GradeReport, key: &str) -> &'a ReportEntry {
        report.catalogs[0]
            .submissions
            .iter()
            .find(|e| e.key == key)
            .unwrap()
    }

    #[test]
    fn build_scores_every_submission() {
        let report = make_report();
        assert_eq!(report.submission_count(), 2);
        let catalog = &report.catalogs[0];
        assert_eq!(catalog.course_count, 1);
        assert_eq!(catalog.enrollment_count, 2);
        assert!(catalog.skipped.is_empty());

        assert_eq!(entry(&report, "alice-1").grade(), Some(1.0));
        // bob: q1 mark 0.5, q2 unanswered, over 2 questions
        assert_eq!(entry(&report, "bob-1").grade(), Some(0.25));
        assert_eq!(entry(&report, "bob-1").scorecard.passed, Some(false));
        assert_eq!(catalog.aggregate.per_course[0].graded, 2);
    }

    #[test]
    fn compare_identical_reports() {
        let report = make_report();
        let cmp = report.compare(&report.clone(), 0.01);
        assert!(cmp.regressions.is_empty());
        assert!(cmp.improvements.is_empty());
        assert_eq!(cmp.unchanged, 2);
        assert!(!cmp.has_regressions());
    }

    #[test]
    fn compare_with_regression_and_improvement() {
        let baseline = make_report();
        let mut current = baseline.clone();
        for e in &mut current.catalogs[0].submissions {
            e.scorecard.outcome = match e.key.as_str() {
                "alice-1" => crate::grading::GradeOutcome::Graded { grade: 0.5 },
                _ => crate::grading::GradeOutcome::Graded { grade: 0.75 },
            };
        }

        let cmp = current.compare(&baseline, 0.01);
        assert_eq!(cmp.regressions.len(), 1);
        assert_eq!(cmp.regressions[0].submission, "alice-1");
        assert!((cmp.regressions[0].delta + 0.5).abs() < 1e-9);
        assert_eq!(cmp.improvements.len(), 1);
        assert_eq!(cmp.improvements[0].submission, "bob-1");
    }

    #[test]
    fn losing_gradability_is_a_regression() {
        let baseline = make_report();
        let mut current = baseline.clone();
        current.catalogs[0].submissions[0].scorecard.outcome =
            crate::grading::GradeOutcome::NotGradable {
                reason: "question 1 has no correct choices".into(),
            };
        let cmp = current.compare(&baseline, 10.0);
        assert_eq!(cmp.regressions.len(), 1);
        assert_eq!(cmp.regressions[0].current_grade, None);
    }

    #[test]
    fn compare_with_new_and_removed() {
        let baseline = make_report();
        let mut current = baseline.clone();
        current.catalogs[0].submissions[0].key = "renamed".into();
        let cmp = current.compare(&baseline, 0.01);
        assert_eq!(cmp.new_submissions, 1);
        assert_eq!(cmp.removed_submissions, 1);
        assert_eq!(cmp.unchanged, 1);
    }

    #[test]
    fn json_roundtrip() {
        let report = make_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");

        report.save_json(&path).unwrap();
        let loaded = GradeReport::load_json(&path).unwrap();

        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.catalogs[0].id, "quiz");
        assert_eq!(loaded.submission_count(), 2);
    }

    #[test]
    fn markdown_output() {
        let report = make_report();
        let md = report.to_markdown();
        assert!(md.contains("## Quiz (quiz)"));
        assert!(md.contains("| alice-1 | alice | Basics | 100.0% | pass |"));
        assert!(md.contains("| bob-1 | bob | Basics | 25.0% | fail |"));

        let mut current = report.clone();
        current.catalogs[0].submissions[0].scorecard.outcome =
            crate::grading::GradeOutcome::Graded { grade: 0.0 };
        let cmp_md = current.compare(&report, 0.01).to_markdown();
        assert!(cmp_md.contains("### Regressions"));
    }
}
