//! Read-side persistence trait.
//!
//! The grading computations only read. Anything that can answer these
//! lookups and relational filters with a consistent snapshot can back them;
//! [`crate::store::MemoryStore`] is the in-process implementation.

use crate::error::GradingResult;
use crate::model::{
    AccountId, Choice, ChoiceAnswer, ChoiceAnswerId, ChoiceId, Course, CourseId, Enrollment,
    EnrollmentId, Instructor, InstructorId, Learner, LearnerId, Lesson, LessonId, Question,
    QuestionId, Submission, SubmissionId,
};

/// Lookups and relational filters over the catalog.
pub trait Repository {
    fn instructor(&self, id: InstructorId) -> GradingResult<&Instructor>;
    fn learner(&self, id: LearnerId) -> GradingResult<&Learner>;
    fn course(&self, id: CourseId) -> GradingResult<&Course>;
    fn lesson(&self, id: LessonId) -> GradingResult<&Lesson>;
    fn enrollment(&self, id: EnrollmentId) -> GradingResult<&Enrollment>;
    fn question(&self, id: QuestionId) -> GradingResult<&Question>;
    fn choice(&self, id: ChoiceId) -> GradingResult<&Choice>;
    fn choice_answer(&self, id: ChoiceAnswerId) -> GradingResult<&ChoiceAnswer>;
    fn submission(&self, id: SubmissionId) -> GradingResult<&Submission>;

    /// All courses, ordered by id.
    fn courses(&self) -> Vec<&Course>;

    /// Questions whose course reference is `course`, ordered by id.
    ///
    /// Questions attached only to a lesson are not included.
    fn questions_for_course(&self, course: CourseId) -> Vec<&Question>;

    /// Questions attached to `lesson`, ordered by id.
    fn questions_for_lesson(&self, lesson: LessonId) -> Vec<&Question>;

    /// Lessons of `course`, ordered by `(order, id)`.
    fn lessons_for_course(&self, course: CourseId) -> Vec<&Lesson>;

    fn enrollments_for_course(&self, course: CourseId) -> Vec<&Enrollment>;
    fn enrollments_for_account(&self, account: &AccountId) -> Vec<&Enrollment>;
    fn submissions_for_enrollment(&self, enrollment: EnrollmentId) -> Vec<&Submission>;

    /// Every choice owned by `question`, in creation order.
    fn all_choices(&self, question: QuestionId) -> GradingResult<Vec<&Choice>> {
        let question = self.question(question)?;
        question.choices.iter().map(|&id| self.choice(id)).collect()
    }

    /// Choices of `question` flagged correct.
    fn correct_choices(&self, question: QuestionId) -> GradingResult<Vec<&Choice>> {
        Ok(self
            .all_choices(question)?
            .into_iter()
            .filter(|c| c.is_correct)
            .collect())
    }
}
