//! Grading and integrity error types.
//!
//! Every grading computation is fallible. Division-by-zero paths are
//! reported as named arithmetic errors, membership violations as integrity
//! errors, and missing rows as not-found errors, so the presentation layer
//! can classify failures without string matching.

use thiserror::Error;

use crate::model::{ChoiceAnswerId, ChoiceId, CourseId, EnrollmentId, QuestionId, SubmissionId};

/// The kind of entity a lookup was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Instructor,
    Learner,
    Course,
    Lesson,
    Enrollment,
    Question,
    Choice,
    ChoiceAnswer,
    Submission,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Instructor => "instructor",
            EntityKind::Learner => "learner",
            EntityKind::Course => "course",
            EntityKind::Lesson => "lesson",
            EntityKind::Enrollment => "enrollment",
            EntityKind::Question => "question",
            EntityKind::Choice => "choice",
            EntityKind::ChoiceAnswer => "choice answer",
            EntityKind::Submission => "submission",
        };
        f.write_str(name)
    }
}

/// Errors raised by the model layer and the grading computations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradingError {
    /// The question has no choice flagged correct, so a partial mark is undefined.
    #[error("question {0} has no correct choices")]
    NoCorrectChoices(QuestionId),

    /// The enrollment's course has no questions, so a grade is undefined.
    #[error("course {0} has no questions")]
    NoQuestions(CourseId),

    /// Weighted grading was requested but the course's question weights sum to zero.
    #[error("course {0} has zero total question weight")]
    ZeroWeight(CourseId),

    /// A choice was referenced against a question it does not belong to.
    #[error("choice {choice} does not belong to question {question}")]
    ForeignChoice {
        choice: ChoiceId,
        question: QuestionId,
    },

    /// A choice answer was attached to a submission whose course does not own its question.
    #[error("choice answer {answer} (question {question}) is outside the course of enrollment {enrollment}")]
    ForeignAnswer {
        answer: ChoiceAnswerId,
        question: QuestionId,
        enrollment: EnrollmentId,
    },

    /// A submission already holds an answer bundle for this question.
    #[error("submission {submission} already answers question {question}")]
    DuplicateAnswer {
        submission: SubmissionId,
        question: QuestionId,
    },

    /// A write referenced rows that disagree with each other.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// The submission is finalized and append-only.
    #[error("submission {0} is finalized")]
    Finalized(SubmissionId),

    /// No row exists for the identifier.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: u64 },
}

impl GradingError {
    pub(crate) fn not_found(kind: EntityKind, id: impl Into<u64>) -> Self {
        GradingError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns `true` for the division-by-zero family.
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            GradingError::NoCorrectChoices(_)
                | GradingError::NoQuestions(_)
                | GradingError::ZeroWeight(_)
        )
    }

    /// Returns `true` when a write or a grading input broke a membership rule.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            GradingError::ForeignChoice { .. }
                | GradingError::ForeignAnswer { .. }
                | GradingError::DuplicateAnswer { .. }
                | GradingError::Integrity(_)
                | GradingError::Finalized(_)
        )
    }

    /// Returns `true` when a lookup missed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GradingError::NotFound { .. })
    }
}

/// Result alias for model-layer operations.
pub type GradingResult<T> = Result<T, GradingError>;
