//! Quiz grading.
//!
//! Turns a submission's answer bundles into a mark and a grade:
//!
//! - a question is *fully correct* when every correct choice was selected
//!   (extra wrong selections are not penalised);
//! - an answer bundle's *mark* is the fraction of the question's correct
//!   choices that were selected;
//! - a submission's *mark* is the plain sum of its bundle marks;
//! - a submission's *grade* is that mark divided by the number of questions
//!   in the enrolled course, so unanswered questions count as zero.
//!
//! Every function reads the current state of the repository and has no side
//! effects. Choice flags edited while a grade is being computed are not
//! guarded against; the result reflects whichever rows were read.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{GradingError, GradingResult};
use crate::model::{
    AccountId, Choice, ChoiceAnswer, ChoiceAnswerId, ChoiceId, CourseId, EnrollmentId, Question,
    QuestionId, SubmissionId, Weighting, DEFAULT_PASSING_GRADE,
};
use crate::repository::Repository;

// ---------------------------------------------------------------------------
// Question level
// ---------------------------------------------------------------------------

/// Whether `selected` contains every correct choice of `question`.
///
/// Selected identifiers must belong to the question. A question without
/// correct choices is trivially satisfied.
pub fn is_get_score<R: Repository + ?Sized>(
    repo: &R,
    question: QuestionId,
    selected: &[ChoiceId],
) -> GradingResult<bool> {
    let owner = repo.question(question)?;
    let selected: BTreeSet<ChoiceId> = selected.iter().copied().collect();
    for &choice in &selected {
        if !owner.owns(choice) {
            return Err(GradingError::ForeignChoice { choice, question });
        }
    }

    let correct = repo.correct_choices(question)?;
    let selected_correct = correct.iter().filter(|c| selected.contains(&c.id)).count();
    Ok(correct.len() == selected_correct)
}

/// Choices of a bundle that are flagged correct.
pub fn answer_correct_choices<R: Repository + ?Sized>(
    repo: &R,
    answer: ChoiceAnswerId,
) -> GradingResult<Vec<&Choice>> {
    Ok(answer_choices(repo, answer)?
        .into_iter()
        .filter(|c| c.is_correct)
        .collect())
}

/// Every choice selected in a bundle, validated against the bundle's question.
pub fn answer_choices<R: Repository + ?Sized>(
    repo: &R,
    answer: ChoiceAnswerId,
) -> GradingResult<Vec<&Choice>> {
    let bundle = repo.choice_answer(answer)?;
    let question = repo.question(bundle.question)?;
    bundle
        .choices
        .iter()
        .map(|&id| {
            if !question.owns(id) {
                return Err(GradingError::ForeignChoice {
                    choice: id,
                    question: question.id,
                });
            }
            repo.choice(id)
        })
        .collect()
}

/// Every correct choice of the bundle's question, selected or not.
pub fn answer_all_correct_choices<R: Repository + ?Sized>(
    repo: &R,
    answer: ChoiceAnswerId,
) -> GradingResult<Vec<&Choice>> {
    repo.correct_choices(repo.choice_answer(answer)?.question)
}

/// Partial mark of one bundle: selected correct choices over all correct choices.
pub fn answer_mark<R: Repository + ?Sized>(repo: &R, answer: ChoiceAnswerId) -> GradingResult<f64> {
    let bundle = repo.choice_answer(answer)?;
    let question = repo.question(bundle.question)?;
    let all_correct = answer_all_correct_choices(repo, answer)?.len();
    if all_correct == 0 {
        return Err(GradingError::NoCorrectChoices(question.id));
    }
    let selected_correct = answer_correct_choices(repo, answer)?.len();
    let mark = selected_correct as f64 / all_correct as f64;
    tracing::debug!("[{}] mark = {mark}", question.text);
    Ok(mark)
}

// ---------------------------------------------------------------------------
// Enrollment and submission level
// ---------------------------------------------------------------------------

/// Every question of the enrollment's course, ignoring lesson scoping.
pub fn enrollment_questions<R: Repository + ?Sized>(
    repo: &R,
    enrollment: EnrollmentId,
) -> GradingResult<Vec<&Question>> {
    let enrollment = repo.enrollment(enrollment)?;
    Ok(repo.questions_for_course(enrollment.course))
}

/// The submission's questions (same as its enrollment's).
pub fn questions<R: Repository + ?Sized>(
    repo: &R,
    submission: SubmissionId,
) -> GradingResult<Vec<&Question>> {
    enrollment_questions(repo, repo.submission(submission)?.enrollment)
}

/// Number of questions a submission is graded against.
pub fn count_questions<R: Repository + ?Sized>(
    repo: &R,
    submission: SubmissionId,
) -> GradingResult<usize> {
    Ok(questions(repo, submission)?.len())
}

/// The submission's answer bundles, checked against its enrollment.
///
/// Each bundle's question must belong to the enrolled course and no
/// question may be answered twice.
pub fn choices_answers<R: Repository + ?Sized>(
    repo: &R,
    submission: SubmissionId,
) -> GradingResult<Vec<&ChoiceAnswer>> {
    let sub = repo.submission(submission)?;
    let enrollment = repo.enrollment(sub.enrollment)?;
    let mut seen = BTreeSet::new();
    sub.choice_answers
        .iter()
        .map(|&id| {
            let bundle = repo.choice_answer(id)?;
            let question = repo.question(bundle.question)?;
            if question.course != Some(enrollment.course) {
                return Err(GradingError::ForeignAnswer {
                    answer: id,
                    question: question.id,
                    enrollment: enrollment.id,
                });
            }
            if !seen.insert(question.id) {
                return Err(GradingError::DuplicateAnswer {
                    submission,
                    question: question.id,
                });
            }
            Ok(bundle)
        })
        .collect()
}

/// Sum of the bundle marks of a submission. Question weights are not applied.
pub fn submission_mark<R: Repository + ?Sized>(
    repo: &R,
    submission: SubmissionId,
) -> GradingResult<f64> {
    let mut mark = 0.0;
    for bundle in choices_answers(repo, submission)? {
        mark += answer_mark(repo, bundle.id)?;
    }
    tracing::debug!("submission {submission}: mark = {mark}");
    Ok(mark)
}

/// Submission mark normalized by the course's full question count.
pub fn submission_grade<R: Repository + ?Sized>(
    repo: &R,
    submission: SubmissionId,
) -> GradingResult<f64> {
    let course = submission_course(repo, submission)?;
    let count = count_questions(repo, submission)?;
    if count == 0 {
        return Err(GradingError::NoQuestions(course));
    }
    Ok(submission_mark(repo, submission)? / count as f64)
}

/// Submission grade with each question's mark scaled by its grade weight and
/// normalized by the course's total weight.
pub fn weighted_grade<R: Repository + ?Sized>(
    repo: &R,
    submission: SubmissionId,
) -> GradingResult<f64> {
    let course = submission_course(repo, submission)?;
    let all = questions(repo, submission)?;
    if all.is_empty() {
        return Err(GradingError::NoQuestions(course));
    }
    let total_weight: u64 = all.iter().map(|q| u64::from(q.grade)).sum();
    if total_weight == 0 {
        return Err(GradingError::ZeroWeight(course));
    }

    let mut earned = 0.0;
    for bundle in choices_answers(repo, submission)? {
        let weight = repo.question(bundle.question)?.grade;
        earned += answer_mark(repo, bundle.id)? * f64::from(weight);
    }
    Ok(earned / total_weight as f64)
}

/// Grade under the given weighting policy.
pub fn grade_with<R: Repository + ?Sized>(
    repo: &R,
    submission: SubmissionId,
    weighting: Weighting,
) -> GradingResult<f64> {
    match weighting {
        Weighting::Unweighted => submission_grade(repo, submission),
        Weighting::Weighted => weighted_grade(repo, submission),
    }
}

/// A grade, or the reason one cannot be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GradeOutcome {
    Graded { grade: f64 },
    NotGradable { reason: String },
}

impl GradeOutcome {
    pub fn grade(&self) -> Option<f64> {
        match self {
            GradeOutcome::Graded { grade } => Some(*grade),
            GradeOutcome::NotGradable { .. } => None,
        }
    }

    pub fn is_gradable(&self) -> bool {
        matches!(self, GradeOutcome::Graded { .. })
    }
}

/// Grade a submission, mapping arithmetic failures to [`GradeOutcome::NotGradable`].
///
/// Integrity and not-found errors are still returned as errors.
pub fn grade_outcome<R: Repository + ?Sized>(
    repo: &R,
    submission: SubmissionId,
    weighting: Weighting,
) -> GradingResult<GradeOutcome> {
    match grade_with(repo, submission, weighting) {
        Ok(grade) => Ok(GradeOutcome::Graded { grade }),
        Err(e) if e.is_arithmetic() => {
            tracing::warn!("submission {submission} is not gradable: {e}");
            Ok(GradeOutcome::NotGradable {
                reason: e.to_string(),
            })
        }
        Err(e) => Err(e),
    }
}

/// Text of the selected choices, per answer bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerText {
    pub question: QuestionId,
    pub choices: Vec<String>,
}

/// Display projection of a submission's answers.
pub fn answers<R: Repository + ?Sized>(
    repo: &R,
    submission: SubmissionId,
) -> GradingResult<Vec<AnswerText>> {
    choices_answers(repo, submission)?
        .into_iter()
        .map(|bundle| {
            let choices = answer_choices(repo, bundle.id)?
                .into_iter()
                .map(|c| c.text.clone().unwrap_or_default())
                .collect();
            Ok(AnswerText {
                question: bundle.question,
                choices,
            })
        })
        .collect()
}

fn submission_course<R: Repository + ?Sized>(
    repo: &R,
    submission: SubmissionId,
) -> GradingResult<CourseId> {
    let sub = repo.submission(submission)?;
    Ok(repo.enrollment(sub.enrollment)?.course)
}

// ---------------------------------------------------------------------------
// Scorecards
// ---------------------------------------------------------------------------

/// Knobs that are a product decision rather than grading arithmetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradingOptions {
    pub weighting: Weighting,
    /// Passing grade (percent) for courses that do not set one.
    pub default_passing_grade: u32,
    /// Tolerance when comparing a grade against the passing grade.
    pub pass_epsilon: f64,
}

impl Default for GradingOptions {
    fn default() -> Self {
        Self {
            weighting: Weighting::Unweighted,
            default_passing_grade: DEFAULT_PASSING_GRADE,
            pass_epsilon: 1e-9,
        }
    }
}

/// Per-question result inside a scorecard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionLine {
    pub question: QuestionId,
    pub text: String,
    pub weight: u32,
    pub answered: bool,
    /// `None` when the question has no correct choices.
    pub mark: Option<f64>,
    pub fully_correct: bool,
}

/// Full grading breakdown of one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scorecard {
    pub submission: SubmissionId,
    pub enrollment: EnrollmentId,
    pub account: AccountId,
    pub course: CourseId,
    pub course_name: String,
    pub finalized: bool,
    /// One line per course question, answered or not.
    pub lines: Vec<QuestionLine>,
    /// Unweighted submission mark, if every answered question is markable.
    pub mark: Option<f64>,
    pub question_count: usize,
    pub weighting: Weighting,
    pub outcome: GradeOutcome,
    pub passing_grade: u32,
    /// `None` when the submission is not gradable.
    pub passed: Option<bool>,
}

/// Build the scorecard of a submission.
pub fn scorecard<R: Repository + ?Sized>(
    repo: &R,
    submission: SubmissionId,
    options: &GradingOptions,
) -> GradingResult<Scorecard> {
    let sub = repo.submission(submission)?;
    let enrollment = repo.enrollment(sub.enrollment)?;
    let course = repo.course(enrollment.course)?;
    let bundles = choices_answers(repo, submission)?;

    let mut lines = Vec::new();
    for question in repo.questions_for_course(course.id) {
        let bundle = bundles.iter().find(|b| b.question == question.id);
        let line = match bundle {
            Some(bundle) => {
                let mark = match answer_mark(repo, bundle.id) {
                    Ok(m) => Some(m),
                    Err(e) if e.is_arithmetic() => None,
                    Err(e) => return Err(e),
                };
                let selected: Vec<ChoiceId> = bundle.choices.iter().copied().collect();
                QuestionLine {
                    question: question.id,
                    text: question.text.clone(),
                    weight: question.grade,
                    answered: true,
                    mark,
                    fully_correct: is_get_score(repo, question.id, &selected)?,
                }
            }
            None => QuestionLine {
                question: question.id,
                text: question.text.clone(),
                weight: question.grade,
                answered: false,
                mark: Some(0.0),
                fully_correct: false,
            },
        };
        lines.push(line);
    }

    let mark = match submission_mark(repo, submission) {
        Ok(m) => Some(m),
        Err(e) if e.is_arithmetic() => None,
        Err(e) => return Err(e),
    };
    let outcome = grade_outcome(repo, submission, options.weighting)?;
    let passing_grade = course.grade.unwrap_or(options.default_passing_grade);
    let passed = outcome
        .grade()
        .map(|g| g * 100.0 + options.pass_epsilon >= f64::from(passing_grade));

    Ok(Scorecard {
        submission,
        enrollment: enrollment.id,
        account: enrollment.account.clone(),
        course: course.id,
        course_name: course.name.clone(),
        finalized: sub.finalized,
        question_count: lines.len(),
        lines,
        mark,
        weighting: options.weighting,
        outcome,
        passing_grade,
        passed,
    })
}
