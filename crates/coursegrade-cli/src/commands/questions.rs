//! The `coursegrade questions` command.

use std::path::PathBuf;

use anyhow::Result;

use coursegrade_core::catalog::parse_catalog;
use coursegrade_core::grading::{answers, enrollment_questions};
use coursegrade_core::repository::Repository;

pub fn execute(catalog_path: PathBuf, enrollment_key: String) -> Result<()> {
    let catalog = parse_catalog(&catalog_path)?;
    let store = &catalog.store;
    let enrollment_id = catalog.keys.enrollment(&enrollment_key)?;
    let enrollment = store.enrollment(enrollment_id)?;
    let course = store.course(enrollment.course)?;

    let questions = enrollment_questions(store, enrollment_id)?;
    println!(
        "Enrollment {enrollment_key}: {} in {} ({} questions)",
        enrollment.account,
        course.name,
        questions.len()
    );

    for question in &questions {
        let correct = store.correct_choices(question.id)?.len();
        println!(
            "  {}. {} [weight {}, {} of {} choices correct]",
            question.id,
            question.text,
            question.grade,
            correct,
            question.choices.len()
        );
    }

    for submission in store.submissions_for_enrollment(enrollment_id) {
        let key = catalog
            .keys
            .submission_key(submission.id)
            .map(str::to_string)
            .unwrap_or_else(|| submission.id.to_string());
        println!("\nSubmission {key}:");
        for answer in answers(store, submission.id)? {
            let text = store.question(answer.question)?.text.as_str();
            println!("  {text}: {}", answer.choices.join(", "));
        }
    }

    Ok(())
}
