//! The `coursegrade check` command.

use std::path::PathBuf;

use anyhow::Result;

use coursegrade_core::catalog::parse_catalog;
use coursegrade_core::grading::{answer_mark, is_get_score};
use coursegrade_core::model::ChoiceId;
use coursegrade_core::repository::Repository;

pub fn execute(catalog_path: PathBuf, question_key: String, choices: String) -> Result<()> {
    let catalog = parse_catalog(&catalog_path)?;
    let question = catalog.keys.question(&question_key)?;
    let selected: Vec<ChoiceId> = choices
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|key| catalog.keys.choice(key))
        .collect::<Result<_>>()?;

    let store = &catalog.store;
    let q = store.question(question)?;
    println!("Question {question_key}: {}", q.text);
    for choice in store.all_choices(question)? {
        let marker = if selected.contains(&choice.id) { "x" } else { " " };
        let flag = if choice.is_correct { " (correct)" } else { "" };
        println!(
            "  [{marker}] {}{flag}",
            choice.text.as_deref().unwrap_or_default()
        );
    }

    let fully_correct = is_get_score(store, question, &selected)?;
    println!(
        "Fully correct: {}",
        if fully_correct { "yes" } else { "no" }
    );

    // Marks are defined on stored answers, so score a scratch copy.
    let mut scratch = store.clone();
    let answer = scratch.create_choice_answer(question, selected, None)?;
    match answer_mark(&scratch, answer) {
        Ok(mark) => println!("Mark: {mark:.2}"),
        Err(e) if e.is_arithmetic() => println!("Mark: n/a ({e})"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
