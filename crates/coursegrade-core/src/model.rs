//! Core data model types for coursegrade.
//!
//! Relations are held as identifier-keyed references plus owning
//! collections: a question owns the ordered list of its choice ids, a
//! choice answer owns the set of choice ids selected for one question, and a
//! submission owns the answer bundles of one attempt.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of an [`Instructor`].
    InstructorId
);
entity_id!(
    /// Identifier of a [`Learner`].
    LearnerId
);
entity_id!(
    /// Identifier of a [`Course`].
    CourseId
);
entity_id!(
    /// Identifier of a [`Lesson`].
    LessonId
);
entity_id!(
    /// Identifier of an [`Enrollment`].
    EnrollmentId
);
entity_id!(
    /// Identifier of a [`Question`].
    QuestionId
);
entity_id!(
    /// Identifier of a [`Choice`].
    ChoiceId
);
entity_id!(
    /// Identifier of a [`ChoiceAnswer`].
    ChoiceAnswerId
);
entity_id!(
    /// Identifier of a [`Submission`].
    SubmissionId
);

/// Opaque account reference supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(account: impl Into<String>) -> Self {
        AccountId(account.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Change-tracking metadata stamped by the write path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    /// Calendar day the row was created.
    pub created_date: NaiveDate,
    /// Creation instant. Never changes after the row is written.
    pub created_at: DateTime<Utc>,
    /// Last modification instant.
    pub updated_at: DateTime<Utc>,
    /// Account that created the row, if known.
    #[serde(default)]
    pub created_by: Option<AccountId>,
    /// Account that last modified the row, if known.
    #[serde(default)]
    pub updated_by: Option<AccountId>,
}

impl Audit {
    pub fn new(actor: Option<&AccountId>, now: DateTime<Utc>) -> Self {
        Self {
            created_date: now.date_naive(),
            created_at: now,
            updated_at: now,
            created_by: actor.cloned(),
            updated_by: actor.cloned(),
        }
    }

    /// Record a modification.
    pub fn touch(&mut self, actor: Option<&AccountId>, now: DateTime<Utc>) {
        self.updated_at = now;
        self.updated_by = actor.cloned();
    }
}

// ---------------------------------------------------------------------------
// Identity records
// ---------------------------------------------------------------------------

/// An account that teaches courses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instructor {
    pub id: InstructorId,
    pub account: AccountId,
    pub full_time: bool,
    pub total_learners: u32,
    pub audit: Audit,
}

impl fmt::Display for Instructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.account)
    }
}

/// A learner's professional background.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Occupation {
    #[default]
    #[serde(rename = "student")]
    Student,
    #[serde(rename = "developer")]
    Developer,
    #[serde(rename = "data_scientist")]
    DataScientist,
    #[serde(rename = "dba")]
    DatabaseAdmin,
}

impl fmt::Display for Occupation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Occupation::Student => write!(f, "student"),
            Occupation::Developer => write!(f, "developer"),
            Occupation::DataScientist => write!(f, "data_scientist"),
            Occupation::DatabaseAdmin => write!(f, "dba"),
        }
    }
}

impl FromStr for Occupation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Occupation::Student),
            "developer" => Ok(Occupation::Developer),
            "data_scientist" | "data scientist" => Ok(Occupation::DataScientist),
            "dba" | "database admin" => Ok(Occupation::DatabaseAdmin),
            other => Err(format!("unknown occupation: {other}")),
        }
    }
}

/// An account that takes courses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learner {
    pub id: LearnerId,
    pub account: AccountId,
    pub occupation: Occupation,
    pub social_link: String,
    pub audit: Audit,
}

impl fmt::Display for Learner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.account, self.occupation)
    }
}

// ---------------------------------------------------------------------------
// Course catalog
// ---------------------------------------------------------------------------

/// Passing grade (percent) used when neither the course nor the config sets one.
pub const DEFAULT_PASSING_GRADE: u32 = 80;

/// Course metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub description: String,
    /// Opaque reference to an uploaded image.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub pub_date: Option<NaiveDate>,
    pub instructors: BTreeSet<InstructorId>,
    /// Denormalized enrollment counter. Can drift from the real row count.
    pub total_enrollment: u32,
    /// Passing grade in percent.
    #[serde(default)]
    pub grade: Option<u32>,
    pub audit: Audit,
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name: {},Description: {}", self.name, self.description)
    }
}

/// Ordered lesson content of a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub course: CourseId,
    pub title: String,
    /// Position within the course. Not unique; ties sort by id.
    pub order: i32,
    pub content: String,
    pub audit: Audit,
}

impl fmt::Display for Lesson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

// ---------------------------------------------------------------------------
// Enrollment
// ---------------------------------------------------------------------------

/// How an account takes a course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnrollmentMode {
    #[default]
    #[serde(rename = "audit")]
    Audit,
    #[serde(rename = "honor")]
    Honor,
    #[serde(rename = "BETA")]
    Beta,
}

impl fmt::Display for EnrollmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrollmentMode::Audit => write!(f, "audit"),
            EnrollmentMode::Honor => write!(f, "honor"),
            EnrollmentMode::Beta => write!(f, "BETA"),
        }
    }
}

impl FromStr for EnrollmentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "audit" => Ok(EnrollmentMode::Audit),
            "honor" => Ok(EnrollmentMode::Honor),
            "beta" => Ok(EnrollmentMode::Beta),
            other => Err(format!("unknown enrollment mode: {other}")),
        }
    }
}

/// Binding of one account to one course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub account: AccountId,
    pub course: CourseId,
    pub date_enrolled: NaiveDate,
    pub mode: EnrollmentMode,
    pub rating: f64,
    pub audit: Audit,
}

// ---------------------------------------------------------------------------
// Assessment content
// ---------------------------------------------------------------------------

/// A multiple-choice question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(default)]
    pub lesson: Option<LessonId>,
    #[serde(default)]
    pub course: Option<CourseId>,
    /// Grade weight. Only applied under [`Weighting::Weighted`].
    pub grade: u32,
    /// Owned choices, in creation order.
    pub choices: Vec<ChoiceId>,
    pub audit: Audit,
}

impl Question {
    pub fn owns(&self, choice: ChoiceId) -> bool {
        self.choices.contains(&choice)
    }
}

/// One selectable option of a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub question: QuestionId,
    #[serde(default)]
    pub text: Option<String>,
    pub is_correct: bool,
    pub audit: Audit,
}

/// The choices a learner selected for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceAnswer {
    pub id: ChoiceAnswerId,
    pub question: QuestionId,
    pub choices: BTreeSet<ChoiceId>,
    pub audit: Audit,
}

/// One quiz attempt of an enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub enrollment: EnrollmentId,
    /// Answer bundles, at most one per question.
    pub choice_answers: Vec<ChoiceAnswerId>,
    /// Legacy flat selection. Stored for compatibility, never graded.
    #[serde(default)]
    pub choices: BTreeSet<ChoiceId>,
    pub finalized: bool,
    pub audit: Audit,
}

/// How question grade weights enter a submission's score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// Every question counts once, regardless of its grade weight.
    #[default]
    Unweighted,
    /// Each question's mark is multiplied by its grade weight and the grade
    /// is normalized by the sum of weights.
    Weighted,
}

impl fmt::Display for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weighting::Unweighted => write!(f, "unweighted"),
            Weighting::Weighted => write!(f, "weighted"),
        }
    }
}

impl FromStr for Weighting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unweighted" => Ok(Weighting::Unweighted),
            "weighted" => Ok(Weighting::Weighted),
            other => Err(format!("unknown weighting: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Write-path inputs
// ---------------------------------------------------------------------------

/// Fields for creating a course.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub pub_date: Option<NaiveDate>,
    pub instructors: BTreeSet<InstructorId>,
    pub grade: Option<u32>,
}

impl Default for NewCourse {
    fn default() -> Self {
        Self {
            name: "online course".to_string(),
            description: String::new(),
            image: None,
            pub_date: None,
            instructors: BTreeSet::new(),
            grade: None,
        }
    }
}

/// Fields for creating a lesson.
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub course: CourseId,
    pub title: String,
    pub order: i32,
    pub content: String,
}

impl NewLesson {
    pub fn new(course: CourseId) -> Self {
        Self {
            course,
            title: "title".to_string(),
            order: 0,
            content: String::new(),
        }
    }
}

/// Fields for creating a question.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub text: String,
    pub lesson: Option<LessonId>,
    pub course: Option<CourseId>,
    pub grade: u32,
}

impl Default for NewQuestion {
    fn default() -> Self {
        Self {
            text: String::new(),
            lesson: None,
            course: None,
            grade: 1,
        }
    }
}

/// Fields for enrolling an account in a course.
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub account: AccountId,
    pub course: CourseId,
    pub date_enrolled: Option<NaiveDate>,
    pub mode: EnrollmentMode,
    pub rating: f64,
}

impl NewEnrollment {
    pub fn new(account: AccountId, course: CourseId) -> Self {
        Self {
            account,
            course,
            date_enrolled: None,
            mode: EnrollmentMode::default(),
            rating: 5.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupation_display_and_parse() {
        assert_eq!(Occupation::DatabaseAdmin.to_string(), "dba");
        assert_eq!(
            "data_scientist".parse::<Occupation>().unwrap(),
            Occupation::DataScientist
        );
        assert_eq!("Developer".parse::<Occupation>().unwrap(), Occupation::Developer);
        assert!("astronaut".parse::<Occupation>().is_err());
        assert_eq!(Occupation::default(), Occupation::Student);
    }

    #[test]
    fn enrollment_mode_keeps_stored_values() {
        assert_eq!(EnrollmentMode::Beta.to_string(), "BETA");
        assert_eq!("beta".parse::<EnrollmentMode>().unwrap(), EnrollmentMode::Beta);
        let json = serde_json::to_string(&EnrollmentMode::Beta).unwrap();
        assert_eq!(json, "\"BETA\"");
        let json = serde_json::to_string(&EnrollmentMode::Honor).unwrap();
        assert_eq!(json, "\"honor\"");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&QuestionId(42)).unwrap();
        assert_eq!(json, "42");
        let id: ChoiceId = serde_json::from_str("7").unwrap();
        assert_eq!(id, ChoiceId(7));
    }

    #[test]
    fn audit_touch_keeps_creation() {
        let alice = AccountId::new("alice");
        let bob = AccountId::new("bob");
        let t0 = Utc::now();
        let mut audit = Audit::new(Some(&alice), t0);
        let t1 = t0 + chrono::Duration::seconds(5);
        audit.touch(Some(&bob), t1);
        assert_eq!(audit.created_at, t0);
        assert_eq!(audit.created_by, Some(alice));
        assert_eq!(audit.updated_at, t1);
        assert_eq!(audit.updated_by, Some(bob));
    }

    #[test]
    fn new_course_defaults() {
        let course = NewCourse::default();
        assert_eq!(course.name, "online course");
        assert_eq!(course.grade, None);
        assert_eq!(NewQuestion::default().grade, 1);
        let enrollment = NewEnrollment::new(AccountId::new("a"), CourseId(1));
        assert_eq!(enrollment.mode, EnrollmentMode::Audit);
        assert!((enrollment.rating - 5.0).abs() < f64::EPSILON);
    }
}
