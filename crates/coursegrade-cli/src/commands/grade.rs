//! The `coursegrade grade` command.

use std::path::PathBuf;

use anyhow::Result;

use coursegrade_core::catalog::load_catalogs;
use coursegrade_core::config::load_config_from;
use coursegrade_core::model::Weighting;
use coursegrade_core::report::GradeReport;

pub fn execute(
    catalog_path: PathBuf,
    weighting: Option<String>,
    output: Option<PathBuf>,
    format: String,
    no_save: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let mut options = config.grading_options();
    if let Some(w) = &weighting {
        options.weighting = w
            .parse::<Weighting>()
            .map_err(|e| anyhow::anyhow!("--weighting: {e}"))?;
    }
    let output = output.unwrap_or(config.output_dir);

    let formats = parse_formats(&format)?;

    let catalogs = load_catalogs(&catalog_path)?;
    anyhow::ensure!(
        !catalogs.is_empty(),
        "no catalogs found at {}",
        catalog_path.display()
    );

    let report = GradeReport::build(&catalogs, &options);
    tracing::info!(
        "graded {} submission(s) across {} catalog(s)",
        report.submission_count(),
        report.catalogs.len()
    );
    print_summary(&report);

    if no_save {
        return Ok(());
    }

    std::fs::create_dir_all(&output)?;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");

    for fmt in formats {
        match fmt {
            ReportFormat::Json => {
                let path = output.join(format!("report-{timestamp}.json"));
                report.save_json(&path)?;
                eprintln!("Results saved to: {}", path.display());
            }
            ReportFormat::Markdown => {
                let path = output.join(format!("report-{timestamp}.md"));
                std::fs::write(&path, report.to_markdown())?;
                eprintln!("Markdown report: {}", path.display());
            }
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Json,
    Markdown,
}

/// Parse `--format`: `all` or a comma-separated list of `json`, `markdown` (`md`).
fn parse_formats(format: &str) -> Result<Vec<ReportFormat>> {
    if format == "all" {
        return Ok(vec![ReportFormat::Json, ReportFormat::Markdown]);
    }
    format
        .split(',')
        .map(|fmt| match fmt.trim() {
            "json" => Ok(ReportFormat::Json),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            other => anyhow::bail!("unknown format: '{other}' (expected json, markdown, all)"),
        })
        .collect()
}

fn print_summary(report: &GradeReport) {
    use comfy_table::{Cell, Table};

    for catalog in &report.catalogs {
        println!(
            "Catalog: {} ({} courses, {} submissions, weighting: {})",
            catalog.name,
            catalog.course_count,
            catalog.submissions.len(),
            report.weighting
        );

        let mut table = Table::new();
        table.set_header(vec![
            "Submission",
            "Learner",
            "Course",
            "Mark",
            "Questions",
            "Grade",
            "Result",
        ]);

        for entry in &catalog.submissions {
            let card = &entry.scorecard;
            let mark = card
                .mark
                .map_or_else(|| "-".to_string(), |m| format!("{m:.2}"));
            let grade = entry
                .grade()
                .map_or_else(|| "-".to_string(), |g| format!("{:.1}%", g * 100.0));
            let result = match card.passed {
                Some(true) => "PASS".to_string(),
                Some(false) => format!("FAIL (< {}%)", card.passing_grade),
                None => "NOT GRADABLE".to_string(),
            };
            table.add_row(vec![
                Cell::new(&entry.key),
                Cell::new(&card.account),
                Cell::new(&card.course_name),
                Cell::new(mark),
                Cell::new(card.question_count),
                Cell::new(grade),
                Cell::new(result),
            ]);
        }

        println!("{table}");

        for skipped in &catalog.skipped {
            println!("  skipped {}: {}", skipped.key, skipped.reason);
        }
    }
}
