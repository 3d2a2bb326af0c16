//! In-memory catalog store.
//!
//! Implements [`Repository`] for the read side and owns the write path:
//! identifier allocation, audit stamping, integrity checks on every write,
//! and cascade deletes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{EntityKind, GradingError, GradingResult};
use crate::model::{
    AccountId, Audit, Choice, ChoiceAnswer, ChoiceAnswerId, ChoiceId, Course, CourseId,
    Enrollment, EnrollmentId, Instructor, InstructorId, Learner, LearnerId, Lesson, LessonId,
    NewCourse, NewEnrollment, NewLesson, NewQuestion, Occupation, Question, QuestionId,
    Submission, SubmissionId,
};
use crate::repository::Repository;

/// Per-entity identifier sequences. Identifiers are never reused.
#[derive(Debug, Default, Clone)]
struct Sequences {
    instructor: u64,
    learner: u64,
    course: u64,
    lesson: u64,
    enrollment: u64,
    question: u64,
    choice: u64,
    choice_answer: u64,
    submission: u64,
}

fn next(seq: &mut u64) -> u64 {
    *seq += 1;
    *seq
}

fn check_passing_grade(grade: Option<u32>) -> GradingResult<()> {
    match grade {
        Some(g) if g > 100 => Err(GradingError::Integrity(format!(
            "passing grade {g} is above 100"
        ))),
        _ => Ok(()),
    }
}

/// Row count as a `u32` counter, clamped at `u32::MAX`.
fn saturating_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// A course whose enrollment counter disagrees with its enrollment rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentDrift {
    pub course: CourseId,
    pub recorded: u32,
    pub actual: u32,
}

/// Catalog held in ordered maps keyed by identifier.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    seq: Sequences,
    instructors: BTreeMap<InstructorId, Instructor>,
    learners: BTreeMap<LearnerId, Learner>,
    courses: BTreeMap<CourseId, Course>,
    lessons: BTreeMap<LessonId, Lesson>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,
    questions: BTreeMap<QuestionId, Question>,
    choices: BTreeMap<ChoiceId, Choice>,
    choice_answers: BTreeMap<ChoiceAnswerId, ChoiceAnswer>,
    submissions: BTreeMap<SubmissionId, Submission>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Identity records
    // -----------------------------------------------------------------------

    pub fn create_instructor(
        &mut self,
        account: AccountId,
        full_time: bool,
        total_learners: u32,
        actor: Option<&AccountId>,
    ) -> InstructorId {
        let id = InstructorId(next(&mut self.seq.instructor));
        self.instructors.insert(
            id,
            Instructor {
                id,
                account,
                full_time,
                total_learners,
                audit: Audit::new(actor, Utc::now()),
            },
        );
        tracing::debug!("instructor {id} created");
        id
    }

    pub fn create_learner(
        &mut self,
        account: AccountId,
        occupation: Occupation,
        social_link: String,
        actor: Option<&AccountId>,
    ) -> LearnerId {
        let id = LearnerId(next(&mut self.seq.learner));
        self.learners.insert(
            id,
            Learner {
                id,
                account,
                occupation,
                social_link,
                audit: Audit::new(actor, Utc::now()),
            },
        );
        tracing::debug!("learner {id} created");
        id
    }

    // -----------------------------------------------------------------------
    // Course catalog
    // -----------------------------------------------------------------------

    pub fn create_course(
        &mut self,
        new: NewCourse,
        actor: Option<&AccountId>,
    ) -> GradingResult<CourseId> {
        check_passing_grade(new.grade)?;
        for &instructor in &new.instructors {
            self.instructor(instructor)?;
        }
        let id = CourseId(next(&mut self.seq.course));
        self.courses.insert(
            id,
            Course {
                id,
                name: new.name,
                description: new.description,
                image: new.image,
                pub_date: new.pub_date,
                instructors: new.instructors,
                total_enrollment: 0,
                grade: new.grade,
                audit: Audit::new(actor, Utc::now()),
            },
        );
        tracing::info!("course {id} created");
        Ok(id)
    }

    pub fn update_course(
        &mut self,
        id: CourseId,
        name: String,
        description: String,
        actor: Option<&AccountId>,
    ) -> GradingResult<()> {
        let course = self.course_mut(id)?;
        course.name = name;
        course.description = description;
        course.audit.touch(actor, Utc::now());
        Ok(())
    }

    /// Set the course's passing grade in percent. `None` defers to configuration.
    pub fn set_passing_grade(
        &mut self,
        id: CourseId,
        grade: Option<u32>,
        actor: Option<&AccountId>,
    ) -> GradingResult<()> {
        check_passing_grade(grade)?;
        let course = self.course_mut(id)?;
        course.grade = grade;
        course.audit.touch(actor, Utc::now());
        Ok(())
    }

    pub fn add_instructor(
        &mut self,
        course: CourseId,
        instructor: InstructorId,
        actor: Option<&AccountId>,
    ) -> GradingResult<()> {
        self.instructor(instructor)?;
        let course = self.course_mut(course)?;
        if course.instructors.insert(instructor) {
            course.audit.touch(actor, Utc::now());
        }
        Ok(())
    }

    pub fn create_lesson(
        &mut self,
        new: NewLesson,
        actor: Option<&AccountId>,
    ) -> GradingResult<LessonId> {
        self.course(new.course)?;
        let id = LessonId(next(&mut self.seq.lesson));
        self.lessons.insert(
            id,
            Lesson {
                id,
                course: new.course,
                title: new.title,
                order: new.order,
                content: new.content,
                audit: Audit::new(actor, Utc::now()),
            },
        );
        tracing::debug!("lesson {id} created in course {}", new.course);
        Ok(id)
    }

    pub fn update_lesson(
        &mut self,
        id: LessonId,
        title: String,
        order: i32,
        content: String,
        actor: Option<&AccountId>,
    ) -> GradingResult<()> {
        let lesson = self
            .lessons
            .get_mut(&id)
            .ok_or_else(|| GradingError::not_found(EntityKind::Lesson, id))?;
        lesson.title = title;
        lesson.order = order;
        lesson.content = content;
        lesson.audit.touch(actor, Utc::now());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Assessment content
    // -----------------------------------------------------------------------

    pub fn create_question(
        &mut self,
        new: NewQuestion,
        actor: Option<&AccountId>,
    ) -> GradingResult<QuestionId> {
        if let Some(course) = new.course {
            self.course(course)?;
        }
        if let Some(lesson) = new.lesson {
            let lesson = self.lesson(lesson)?;
            if let Some(course) = new.course {
                if lesson.course != course {
                    return Err(GradingError::Integrity(format!(
                        "lesson {} belongs to course {}, not course {course}",
                        lesson.id, lesson.course
                    )));
                }
            }
        }
        let id = QuestionId(next(&mut self.seq.question));
        self.questions.insert(
            id,
            Question {
                id,
                text: new.text,
                lesson: new.lesson,
                course: new.course,
                grade: new.grade,
                choices: Vec::new(),
                audit: Audit::new(actor, Utc::now()),
            },
        );
        tracing::debug!("question {id} created");
        Ok(id)
    }

    pub fn update_question(
        &mut self,
        id: QuestionId,
        text: String,
        grade: u32,
        actor: Option<&AccountId>,
    ) -> GradingResult<()> {
        let question = self.question_mut(id)?;
        question.text = text;
        question.grade = grade;
        question.audit.touch(actor, Utc::now());
        Ok(())
    }

    pub fn add_choice(
        &mut self,
        question: QuestionId,
        text: Option<String>,
        is_correct: bool,
        actor: Option<&AccountId>,
    ) -> GradingResult<ChoiceId> {
        self.question(question)?;
        let id = ChoiceId(next(&mut self.seq.choice));
        let now = Utc::now();
        self.choices.insert(
            id,
            Choice {
                id,
                question,
                text,
                is_correct,
                audit: Audit::new(actor, now),
            },
        );
        let owner = self.question_mut(question)?;
        owner.choices.push(id);
        owner.audit.touch(actor, now);
        Ok(id)
    }

    /// Flip a choice's correctness flag.
    ///
    /// Grading reads the flag at call time, so submissions graded after this
    /// write see the new answer key.
    pub fn set_choice_correct(
        &mut self,
        id: ChoiceId,
        is_correct: bool,
        actor: Option<&AccountId>,
    ) -> GradingResult<()> {
        let now = Utc::now();
        let choice = self
            .choices
            .get_mut(&id)
            .ok_or_else(|| GradingError::not_found(EntityKind::Choice, id))?;
        choice.is_correct = is_correct;
        choice.audit.touch(actor, now);
        let question = choice.question;
        self.question_mut(question)?.audit.touch(actor, now);
        tracing::info!("choice {id} of question {question} set correct={is_correct}");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Enrollment
    // -----------------------------------------------------------------------

    /// Enroll an account in a course and bump the course's counter.
    ///
    /// Duplicate (account, course) pairs are accepted.
    pub fn enroll(
        &mut self,
        new: NewEnrollment,
        actor: Option<&AccountId>,
    ) -> GradingResult<EnrollmentId> {
        let now = Utc::now();
        let course = self.course_mut(new.course)?;
        course.total_enrollment += 1;
        course.audit.touch(actor, now);

        let id = EnrollmentId(next(&mut self.seq.enrollment));
        self.enrollments.insert(
            id,
            Enrollment {
                id,
                account: new.account.clone(),
                course: new.course,
                date_enrolled: new.date_enrolled.unwrap_or_else(|| now.date_naive()),
                mode: new.mode,
                rating: new.rating,
                audit: Audit::new(actor, now),
            },
        );
        tracing::info!("enrollment {id}: [{}] in course {}", new.account, new.course);
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Answers and submissions
    // -----------------------------------------------------------------------

    /// Create a choice bundle for one question. Every choice must belong to it.
    pub fn create_choice_answer(
        &mut self,
        question: QuestionId,
        choices: impl IntoIterator<Item = ChoiceId>,
        actor: Option<&AccountId>,
    ) -> GradingResult<ChoiceAnswerId> {
        let owner = self.question(question)?;
        let choices: BTreeSet<ChoiceId> = choices.into_iter().collect();
        for &choice in &choices {
            self.choice(choice)?;
            if !owner.owns(choice) {
                return Err(GradingError::ForeignChoice { choice, question });
            }
        }
        let id = ChoiceAnswerId(next(&mut self.seq.choice_answer));
        self.choice_answers.insert(
            id,
            ChoiceAnswer {
                id,
                question,
                choices,
                audit: Audit::new(actor, Utc::now()),
            },
        );
        Ok(id)
    }

    pub fn create_submission(
        &mut self,
        enrollment: EnrollmentId,
        actor: Option<&AccountId>,
    ) -> GradingResult<SubmissionId> {
        self.enrollment(enrollment)?;
        let id = SubmissionId(next(&mut self.seq.submission));
        self.submissions.insert(
            id,
            Submission {
                id,
                enrollment,
                choice_answers: Vec::new(),
                choices: BTreeSet::new(),
                finalized: false,
                audit: Audit::new(actor, Utc::now()),
            },
        );
        tracing::info!("submission {id} opened for enrollment {enrollment}");
        Ok(id)
    }

    /// Attach an existing choice bundle to an open submission.
    ///
    /// The bundle's question must belong to the enrollment's course, the
    /// submission must not already answer it, and the bundle must not be
    /// attached to any submission yet. A bundle has at most one owner, so
    /// cascade deletes never strand another submission's answer.
    pub fn attach_answer(
        &mut self,
        submission: SubmissionId,
        answer: ChoiceAnswerId,
        actor: Option<&AccountId>,
    ) -> GradingResult<()> {
        let sub = self.submission(submission)?;
        if sub.finalized {
            return Err(GradingError::Finalized(submission));
        }
        let enrollment = self.enrollment(sub.enrollment)?;
        let bundle = self.choice_answer(answer)?;
        let question = self.question(bundle.question)?;
        if question.course != Some(enrollment.course) {
            return Err(GradingError::ForeignAnswer {
                answer,
                question: question.id,
                enrollment: enrollment.id,
            });
        }
        if let Some(owner) = self
            .submissions
            .values()
            .find(|s| s.choice_answers.contains(&answer))
        {
            return Err(GradingError::Integrity(format!(
                "choice answer {answer} is already attached to submission {}",
                owner.id
            )));
        }
        for &existing in &sub.choice_answers {
            if self.choice_answer(existing)?.question == question.id {
                return Err(GradingError::DuplicateAnswer {
                    submission,
                    question: question.id,
                });
            }
        }

        let sub = self.submission_mut(submission)?;
        sub.choice_answers.push(answer);
        sub.audit.touch(actor, Utc::now());
        Ok(())
    }

    /// Create a choice bundle for `question` and attach it to `submission`.
    pub fn record_answer(
        &mut self,
        submission: SubmissionId,
        question: QuestionId,
        choices: impl IntoIterator<Item = ChoiceId>,
        actor: Option<&AccountId>,
    ) -> GradingResult<ChoiceAnswerId> {
        if self.submission(submission)?.finalized {
            return Err(GradingError::Finalized(submission));
        }
        let answer = self.create_choice_answer(question, choices, actor)?;
        if let Err(e) = self.attach_answer(submission, answer, actor) {
            self.choice_answers.remove(&answer);
            return Err(e);
        }
        tracing::debug!("submission {submission}: answer {answer} recorded for question {question}");
        Ok(answer)
    }

    /// Store choices in the legacy flat selection of an open submission.
    pub fn record_legacy_choices(
        &mut self,
        submission: SubmissionId,
        choices: impl IntoIterator<Item = ChoiceId>,
        actor: Option<&AccountId>,
    ) -> GradingResult<()> {
        if self.submission(submission)?.finalized {
            return Err(GradingError::Finalized(submission));
        }
        let choices: Vec<ChoiceId> = choices.into_iter().collect();
        for &choice in &choices {
            self.choice(choice)?;
        }
        let sub = self.submission_mut(submission)?;
        sub.choices.extend(choices);
        sub.audit.touch(actor, Utc::now());
        Ok(())
    }

    /// Close a submission. Finalizing twice is a no-op.
    pub fn finalize_submission(
        &mut self,
        id: SubmissionId,
        actor: Option<&AccountId>,
    ) -> GradingResult<()> {
        let sub = self.submission_mut(id)?;
        if !sub.finalized {
            sub.finalized = true;
            sub.audit.touch(actor, Utc::now());
            tracing::info!("submission {id} finalized");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cascade deletes
    // -----------------------------------------------------------------------

    /// Delete a course with its lessons, questions, choices, answers,
    /// enrollments and submissions.
    pub fn delete_course(&mut self, id: CourseId) -> GradingResult<()> {
        self.course(id)?;

        let enrollments: Vec<EnrollmentId> = self
            .enrollments
            .values()
            .filter(|e| e.course == id)
            .map(|e| e.id)
            .collect();
        for enrollment in enrollments {
            self.remove_enrollment_rows(enrollment);
        }

        let lessons: BTreeSet<LessonId> = self
            .lessons
            .values()
            .filter(|l| l.course == id)
            .map(|l| l.id)
            .collect();
        let questions: Vec<QuestionId> = self
            .questions
            .values()
            .filter(|q| q.course == Some(id) || q.lesson.is_some_and(|l| lessons.contains(&l)))
            .map(|q| q.id)
            .collect();
        for question in questions {
            self.remove_question_rows(question);
        }
        self.lessons.retain(|_, l| l.course != id);
        self.courses.remove(&id);
        tracing::info!("course {id} deleted");
        Ok(())
    }

    /// Delete a question with its choices and answer bundles, detaching the
    /// bundles from any submission that referenced them.
    pub fn delete_question(&mut self, id: QuestionId) -> GradingResult<()> {
        self.question(id)?;
        self.remove_question_rows(id);
        tracing::info!("question {id} deleted");
        Ok(())
    }

    /// Delete an enrollment with its submissions and decrement the course counter.
    pub fn delete_enrollment(
        &mut self,
        id: EnrollmentId,
        actor: Option<&AccountId>,
    ) -> GradingResult<()> {
        let course = self.enrollment(id)?.course;
        self.remove_enrollment_rows(id);
        let course = self.course_mut(course)?;
        course.total_enrollment = course.total_enrollment.saturating_sub(1);
        course.audit.touch(actor, Utc::now());
        tracing::info!("enrollment {id} deleted");
        Ok(())
    }

    fn remove_enrollment_rows(&mut self, id: EnrollmentId) {
        let submissions: Vec<Submission> = self
            .submissions
            .values()
            .filter(|s| s.enrollment == id)
            .cloned()
            .collect();
        for sub in submissions {
            for answer in &sub.choice_answers {
                self.choice_answers.remove(answer);
            }
            self.submissions.remove(&sub.id);
        }
        self.enrollments.remove(&id);
    }

    fn remove_question_rows(&mut self, id: QuestionId) {
        let answers: BTreeSet<ChoiceAnswerId> = self
            .choice_answers
            .values()
            .filter(|a| a.question == id)
            .map(|a| a.id)
            .collect();
        let choices: BTreeSet<ChoiceId> = self
            .choices
            .values()
            .filter(|c| c.question == id)
            .map(|c| c.id)
            .collect();
        for sub in self.submissions.values_mut() {
            sub.choice_answers.retain(|a| !answers.contains(a));
            sub.choices.retain(|c| !choices.contains(c));
        }
        self.choice_answers.retain(|_, a| a.question != id);
        self.choices.retain(|_, c| c.question != id);
        self.questions.remove(&id);
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Courses whose `total_enrollment` disagrees with their enrollment rows.
    pub fn enrollment_drift(&self) -> Vec<EnrollmentDrift> {
        self.courses
            .values()
            .filter_map(|c| {
                let actual = saturating_count(self.enrollments_for_course(c.id).len());
                (actual != c.total_enrollment).then_some(EnrollmentDrift {
                    course: c.id,
                    recorded: c.total_enrollment,
                    actual,
                })
            })
            .collect()
    }

    /// Rewrite drifted enrollment counters. Returns how many courses changed.
    pub fn recount_enrollments(&mut self, actor: Option<&AccountId>) -> usize {
        let drift = self.enrollment_drift();
        let now = Utc::now();
        for d in &drift {
            if let Some(course) = self.courses.get_mut(&d.course) {
                tracing::warn!(
                    "course {}: total_enrollment {} corrected to {}",
                    d.course,
                    d.recorded,
                    d.actual
                );
                course.total_enrollment = d.actual;
                course.audit.touch(actor, now);
            }
        }
        drift.len()
    }

    /// Overwrite a course's counter without touching enrollment rows.
    ///
    /// Catalog imports use this to carry a recorded counter that may not
    /// match the rows.
    pub fn set_total_enrollment(&mut self, id: CourseId, total: u32) -> GradingResult<()> {
        self.course_mut(id)?.total_enrollment = total;
        Ok(())
    }

    pub fn instructors(&self) -> impl Iterator<Item = &Instructor> {
        self.instructors.values()
    }

    pub fn learners(&self) -> impl Iterator<Item = &Learner> {
        self.learners.values()
    }

    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.questions.values()
    }

    pub fn enrollments(&self) -> impl Iterator<Item = &Enrollment> {
        self.enrollments.values()
    }

    pub fn submissions(&self) -> impl Iterator<Item = &Submission> {
        self.submissions.values()
    }

    fn course_mut(&mut self, id: CourseId) -> GradingResult<&mut Course> {
        self.courses
            .get_mut(&id)
            .ok_or_else(|| GradingError::not_found(EntityKind::Course, id))
    }

    fn question_mut(&mut self, id: QuestionId) -> GradingResult<&mut Question> {
        self.questions
            .get_mut(&id)
            .ok_or_else(|| GradingError::not_found(EntityKind::Question, id))
    }

    fn submission_mut(&mut self, id: SubmissionId) -> GradingResult<&mut Submission> {
        self.submissions
            .get_mut(&id)
            .ok_or_else(|| GradingError::not_found(EntityKind::Submission, id))
    }
}

impl Repository for MemoryStore {
    fn instructor(&self, id: InstructorId) -> GradingResult<&Instructor> {
        self.instructors
            .get(&id)
            .ok_or_else(|| GradingError::not_found(EntityKind::Instructor, id))
    }

    fn learner(&self, id: LearnerId) -> GradingResult<&Learner> {
        self.learners
            .get(&id)
            .ok_or_else(|| GradingError::not_found(EntityKind::Learner, id))
    }

    fn course(&self, id: CourseId) -> GradingResult<&Course> {
        self.courses
            .get(&id)
            .ok_or_else(|| GradingError::not_found(EntityKind::Course, id))
    }

    fn lesson(&self, id: LessonId) -> GradingResult<&Lesson> {
        self.lessons
            .get(&id)
            .ok_or_else(|| GradingError::not_found(EntityKind::Lesson, id))
    }

    fn enrollment(&self, id: EnrollmentId) -> GradingResult<&Enrollment> {
        self.enrollments
            .get(&id)
            .ok_or_else(|| GradingError::not_found(EntityKind::Enrollment, id))
    }

    fn question(&self, id: QuestionId) -> GradingResult<&Question> {
        self.questions
            .get(&id)
            .ok_or_else(|| GradingError::not_found(EntityKind::Question, id))
    }

    fn choice(&self, id: ChoiceId) -> GradingResult<&Choice> {
        self.choices
            .get(&id)
            .ok_or_else(|| GradingError::not_found(EntityKind::Choice, id))
    }

    fn choice_answer(&self, id: ChoiceAnswerId) -> GradingResult<&ChoiceAnswer> {
        self.choice_answers
            .get(&id)
            .ok_or_else(|| GradingError::not_found(EntityKind::ChoiceAnswer, id))
    }

    fn submission(&self, id: SubmissionId) -> GradingResult<&Submission> {
        self.submissions
            .get(&id)
            .ok_or_else(|| GradingError::not_found(EntityKind::Submission, id))
    }

    fn courses(&self) -> Vec<&Course> {
        self.courses.values().collect()
    }

    fn questions_for_course(&self, course: CourseId) -> Vec<&Question> {
        self.questions
            .values()
            .filter(|q| q.course == Some(course))
            .collect()
    }

    fn questions_for_lesson(&self, lesson: LessonId) -> Vec<&Question> {
        self.questions
            .values()
            .filter(|q| q.lesson == Some(lesson))
            .collect()
    }

    fn lessons_for_course(&self, course: CourseId) -> Vec<&Lesson> {
        let mut lessons: Vec<&Lesson> = self
            .lessons
            .values()
            .filter(|l| l.course == course)
            .collect();
        lessons.sort_by_key(|l| (l.order, l.id));
        lessons
    }

    fn enrollments_for_course(&self, course: CourseId) -> Vec<&Enrollment> {
        self.enrollments
            .values()
            .filter(|e| e.course == course)
            .collect()
    }

    fn enrollments_for_account(&self, account: &AccountId) -> Vec<&Enrollment> {
        self.enrollments
            .values()
            .filter(|e| &e.account == account)
            .collect()
    }

    fn submissions_for_enrollment(&self, enrollment: EnrollmentId) -> Vec<&Submission> {
        self.submissions
            .values()
            .filter(|s| s.enrollment == enrollment)
            .collect()
    }
}
