//! Aggregate statistics over graded submissions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grading::{GradeOutcome, Scorecard};
use crate::model::{CourseId, QuestionId};

/// Aggregate statistics across all scorecards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Per-course statistics, ordered by course id.
    pub per_course: Vec<CourseStats>,
    /// Per-question statistics, ordered by question id.
    pub per_question: Vec<QuestionStats>,
}

/// Statistics for one course across its submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseStats {
    pub course: CourseId,
    pub course_name: String,
    pub question_count: usize,
    pub submissions: usize,
    pub graded: usize,
    pub not_gradable: usize,
    pub mean_grade: Option<f64>,
    pub min_grade: Option<f64>,
    pub max_grade: Option<f64>,
    /// Share of graded submissions that met the passing grade.
    pub pass_rate: Option<f64>,
}

/// Statistics for one question across the submissions that answered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionStats {
    pub question: QuestionId,
    pub course: CourseId,
    pub text: String,
    pub attempts: usize,
    pub fully_correct: usize,
    pub correct_rate: f64,
    /// Mean partial mark over markable attempts.
    pub mean_mark: Option<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Compute aggregate statistics from scorecards.
pub fn compute_aggregate_stats(scorecards: &[Scorecard]) -> AggregateStats {
    let mut by_course: BTreeMap<CourseId, Vec<&Scorecard>> = BTreeMap::new();
    for card in scorecards {
        by_course.entry(card.course).or_default().push(card);
    }

    let per_course = by_course
        .into_iter()
        .map(|(course, cards)| {
            let grades: Vec<f64> = cards.iter().filter_map(|c| c.outcome.grade()).collect();
            let passed = cards.iter().filter(|c| c.passed == Some(true)).count();
            let not_gradable = cards
                .iter()
                .filter(|c| matches!(c.outcome, GradeOutcome::NotGradable { .. }))
                .count();
            CourseStats {
                course,
                course_name: cards[0].course_name.clone(),
                question_count: cards[0].question_count,
                submissions: cards.len(),
                graded: grades.len(),
                not_gradable,
                mean_grade: mean(&grades),
                min_grade: grades.iter().copied().reduce(f64::min),
                max_grade: grades.iter().copied().reduce(f64::max),
                pass_rate: (!grades.is_empty()).then(|| passed as f64 / grades.len() as f64),
            }
        })
        .collect();

    struct Tally {
        course: CourseId,
        text: String,
        attempts: usize,
        fully_correct: usize,
        marks: Vec<f64>,
    }

    let mut tallies: BTreeMap<QuestionId, Tally> = BTreeMap::new();
    for card in scorecards {
        for line in card.lines.iter().filter(|l| l.answered) {
            let tally = tallies.entry(line.question).or_insert_with(|| Tally {
                course: card.course,
                text: line.text.clone(),
                attempts: 0,
                fully_correct: 0,
                marks: Vec::new(),
            });
            tally.attempts += 1;
            if line.fully_correct {
                tally.fully_correct += 1;
            }
            if let Some(mark) = line.mark {
                tally.marks.push(mark);
            }
        }
    }

    let per_question = tallies
        .into_iter()
        .map(|(question, t)| QuestionStats {
            question,
            course: t.course,
            text: t.text,
            attempts: t.attempts,
            fully_correct: t.fully_correct,
            correct_rate: t.fully_correct as f64 / t.attempts.max(1) as f64,
            mean_mark: mean(&t.marks),
        })
        .collect();

    AggregateStats {
        per_course,
        per_question,
    }
}
