//! TOML catalog loader.
//!
//! A catalog file describes instructors, learners, courses (with their
//! lessons, questions and choices), enrollments and submissions. Rows refer
//! to each other by string keys; loading replays them through the
//! [`MemoryStore`] write path so every integrity rule applies.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::model::{
    AccountId, ChoiceId, CourseId, EnrollmentId, EnrollmentMode, InstructorId, LessonId,
    NewCourse, NewEnrollment, NewLesson, NewQuestion, Occupation, QuestionId, SubmissionId,
};
use crate::repository::Repository;
use crate::store::MemoryStore;

/// Intermediate TOML structure for catalog files.
#[derive(Debug, Deserialize)]
struct TomlCatalogFile {
    catalog: TomlCatalogHeader,
    #[serde(default)]
    instructors: Vec<TomlInstructor>,
    #[serde(default)]
    learners: Vec<TomlLearner>,
    #[serde(default)]
    courses: Vec<TomlCourse>,
    #[serde(default)]
    enrollments: Vec<TomlEnrollment>,
    #[serde(default)]
    submissions: Vec<TomlSubmission>,
}

#[derive(Debug, Deserialize)]
struct TomlCatalogHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    imported_by: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlInstructor {
    account: String,
    #[serde(default = "default_true")]
    full_time: bool,
    #[serde(default)]
    total_learners: u32,
}

#[derive(Debug, Deserialize)]
struct TomlLearner {
    account: String,
    #[serde(default)]
    occupation: Option<String>,
    #[serde(default)]
    social_link: String,
}

#[derive(Debug, Deserialize)]
struct TomlCourse {
    key: String,
    #[serde(default = "default_course_name")]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    pub_date: Option<String>,
    #[serde(default)]
    instructors: Vec<String>,
    /// Percent; when absent the configured default applies at grading time.
    #[serde(default)]
    passing_grade: Option<u32>,
    /// Recorded enrollment counter, kept as-is even if it disagrees with the rows.
    #[serde(default)]
    total_enrollment: Option<u32>,
    #[serde(default)]
    lessons: Vec<TomlLesson>,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

fn default_course_name() -> String {
    "online course".to_string()
}

#[derive(Debug, Deserialize)]
struct TomlLesson {
    key: String,
    #[serde(default = "default_lesson_title")]
    title: String,
    #[serde(default)]
    order: i32,
    #[serde(default)]
    content: String,
}

fn default_lesson_title() -> String {
    "title".to_string()
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    key: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    lesson: Option<String>,
    #[serde(default = "default_weight")]
    grade: u32,
    /// When false the question is attached to its lesson only.
    #[serde(default = "default_true")]
    course_scoped: bool,
    #[serde(default)]
    choices: Vec<TomlChoice>,
}

fn default_weight() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct TomlChoice {
    key: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    correct: bool,
}

#[derive(Debug, Deserialize)]
struct TomlEnrollment {
    key: String,
    account: String,
    course: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default = "default_rating")]
    rating: f64,
    #[serde(default)]
    date_enrolled: Option<String>,
}

fn default_rating() -> f64 {
    5.0
}

#[derive(Debug, Deserialize)]
struct TomlSubmission {
    key: String,
    enrollment: String,
    #[serde(default)]
    finalized: bool,
    #[serde(default)]
    legacy_choices: Vec<String>,
    #[serde(default)]
    answers: Vec<TomlAnswer>,
}

#[derive(Debug, Deserialize)]
struct TomlAnswer {
    question: String,
    #[serde(default)]
    choices: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// String keys of a catalog file mapped to store identifiers.
#[derive(Debug, Default, Clone)]
pub struct CatalogKeys {
    pub courses: BTreeMap<String, CourseId>,
    pub lessons: BTreeMap<String, LessonId>,
    pub questions: BTreeMap<String, QuestionId>,
    pub choices: BTreeMap<String, ChoiceId>,
    pub enrollments: BTreeMap<String, EnrollmentId>,
    pub submissions: BTreeMap<String, SubmissionId>,
}

impl CatalogKeys {
    pub fn course(&self, key: &str) -> Result<CourseId> {
        lookup(&self.courses, "course", key)
    }

    pub fn question(&self, key: &str) -> Result<QuestionId> {
        lookup(&self.questions, "question", key)
    }

    pub fn choice(&self, key: &str) -> Result<ChoiceId> {
        lookup(&self.choices, "choice", key)
    }

    pub fn enrollment(&self, key: &str) -> Result<EnrollmentId> {
        lookup(&self.enrollments, "enrollment", key)
    }

    pub fn submission(&self, key: &str) -> Result<SubmissionId> {
        lookup(&self.submissions, "submission", key)
    }

    /// Key of a submission id, for display.
    pub fn submission_key(&self, id: SubmissionId) -> Option<&str> {
        self.submissions
            .iter()
            .find(|(_, &v)| v == id)
            .map(|(k, _)| k.as_str())
    }
}

fn lookup<T: Copy>(map: &BTreeMap<String, T>, kind: &str, key: &str) -> Result<T> {
    map.get(key)
        .copied()
        .ok_or_else(|| anyhow::anyhow!("unknown {kind} key: '{key}'"))
}

fn insert_key<T>(map: &mut BTreeMap<String, T>, kind: &str, key: &str, id: T) -> Result<()> {
    if map.insert(key.to_string(), id).is_some() {
        anyhow::bail!("duplicate {kind} key: '{key}'");
    }
    Ok(())
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    value
        .parse::<NaiveDate>()
        .with_context(|| format!("invalid {field} '{value}', expected YYYY-MM-DD"))
}

/// A loaded catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub id: String,
    pub name: String,
    pub description: String,
    pub store: MemoryStore,
    pub keys: CatalogKeys,
}

/// Parse a single TOML catalog file.
pub fn parse_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;

    parse_catalog_str(&content, path)
}

/// Parse a TOML string into a [`Catalog`].
pub fn parse_catalog_str(content: &str, source_path: &Path) -> Result<Catalog> {
    let parsed: TomlCatalogFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let actor = parsed.catalog.imported_by.map(AccountId::new);
    let actor = actor.as_ref();
    let mut store = MemoryStore::new();
    let mut keys = CatalogKeys::default();
    let mut recorded_totals: Vec<(CourseId, u32)> = Vec::new();

    let mut instructors: HashMap<String, InstructorId> = HashMap::new();
    for i in parsed.instructors {
        let id = store.create_instructor(
            AccountId::new(i.account.clone()),
            i.full_time,
            i.total_learners,
            actor,
        );
        if instructors.insert(i.account.clone(), id).is_some() {
            anyhow::bail!("duplicate instructor account: '{}'", i.account);
        }
    }

    for l in parsed.learners {
        let occupation: Occupation = l
            .occupation
            .map(|o| o.parse().map_err(|e: String| anyhow::anyhow!("{}", e)))
            .transpose()?
            .unwrap_or_default();
        store.create_learner(AccountId::new(l.account), occupation, l.social_link, actor);
    }

    for c in parsed.courses {
        let course_instructors: BTreeSet<InstructorId> = c
            .instructors
            .iter()
            .map(|account| {
                instructors
                    .get(account)
                    .copied()
                    .ok_or_else(|| anyhow::anyhow!("course '{}': unknown instructor '{account}'", c.key))
            })
            .collect::<Result<_>>()?;
        let pub_date = c
            .pub_date
            .as_deref()
            .map(|d| parse_date("pub_date", d))
            .transpose()?;

        let course = store
            .create_course(
                NewCourse {
                    name: c.name,
                    description: c.description,
                    image: c.image,
                    pub_date,
                    instructors: course_instructors,
                    grade: c.passing_grade,
                },
                actor,
            )
            .with_context(|| format!("course '{}'", c.key))?;
        insert_key(&mut keys.courses, "course", &c.key, course)?;

        let mut course_lessons: HashMap<&str, LessonId> = HashMap::new();
        for l in &c.lessons {
            let lesson = store.create_lesson(
                NewLesson {
                    course,
                    title: l.title.clone(),
                    order: l.order,
                    content: l.content.clone(),
                },
                actor,
            )?;
            insert_key(&mut keys.lessons, "lesson", &l.key, lesson)?;
            course_lessons.insert(l.key.as_str(), lesson);
        }

        for q in c.questions {
            let lesson = q
                .lesson
                .as_deref()
                .map(|key| {
                    course_lessons.get(key).copied().ok_or_else(|| {
                        anyhow::anyhow!("question '{}': lesson '{key}' is not in course '{}'", q.key, c.key)
                    })
                })
                .transpose()?;
            let question = store
                .create_question(
                    NewQuestion {
                        text: q.text,
                        lesson,
                        course: q.course_scoped.then_some(course),
                        grade: q.grade,
                    },
                    actor,
                )
                .with_context(|| format!("question '{}'", q.key))?;
            insert_key(&mut keys.questions, "question", &q.key, question)?;

            for ch in q.choices {
                let choice = store.add_choice(question, ch.text, ch.correct, actor)?;
                insert_key(&mut keys.choices, "choice", &ch.key, choice)?;
            }
        }

        if let Some(total) = c.total_enrollment {
            recorded_totals.push((course, total));
        }
    }

    for e in parsed.enrollments {
        let course = keys
            .course(&e.course)
            .with_context(|| format!("enrollment '{}'", e.key))?;
        let mode: EnrollmentMode = e
            .mode
            .map(|m| m.parse().map_err(|err: String| anyhow::anyhow!("{}", err)))
            .transpose()?
            .unwrap_or_default();
        let date_enrolled = e
            .date_enrolled
            .as_deref()
            .map(|d| parse_date("date_enrolled", d))
            .transpose()?;
        let enrollment = store.enroll(
            NewEnrollment {
                account: AccountId::new(e.account),
                course,
                date_enrolled,
                mode,
                rating: e.rating,
            },
            actor,
        )?;
        insert_key(&mut keys.enrollments, "enrollment", &e.key, enrollment)?;
    }

    // A recorded counter in the file wins over the one bumped by `enroll`.
    for (course, total) in recorded_totals {
        store.set_total_enrollment(course, total)?;
    }

    for s in parsed.submissions {
        let enrollment = keys
            .enrollment(&s.enrollment)
            .with_context(|| format!("submission '{}'", s.key))?;
        let submission = store.create_submission(enrollment, actor)?;
        insert_key(&mut keys.submissions, "submission", &s.key, submission)?;

        for a in s.answers {
            let question = keys
                .question(&a.question)
                .with_context(|| format!("submission '{}'", s.key))?;
            let choices = a
                .choices
                .iter()
                .map(|k| keys.choice(k))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("submission '{}'", s.key))?;
            store
                .record_answer(submission, question, choices, actor)
                .with_context(|| format!("submission '{}', question '{}'", s.key, a.question))?;
        }

        let legacy = s
            .legacy_choices
            .iter()
            .map(|k| keys.choice(k))
            .collect::<Result<Vec<_>>>()?;
        if !legacy.is_empty() {
            store.record_legacy_choices(submission, legacy, actor)?;
        }
        if s.finalized {
            store.finalize_submission(submission, actor)?;
        }
    }

    Ok(Catalog {
        id: parsed.catalog.id,
        name: parsed.catalog.name,
        description: parsed.catalog.description,
        store,
        keys,
    })
}

/// Recursively load all `.toml` catalog files from a directory.
pub fn load_catalog_directory(dir: &Path) -> Result<Vec<Catalog>> {
    let mut catalogs = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            catalogs.extend(load_catalog_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_catalog(&path) {
                Ok(catalog) => catalogs.push(catalog),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(catalogs)
}

/// Load a single catalog file, or every catalog under a directory.
pub fn load_catalogs(path: &Path) -> Result<Vec<Catalog>> {
    if path.is_dir() {
        load_catalog_directory(path)
    } else {
        Ok(vec![parse_catalog(path)?])
    }
}

/// A warning from catalog validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The course the warning is about, if any.
    pub course: Option<CourseId>,
    pub message: String,
}

/// Check a catalog for conditions that make grading ambiguous or impossible.
pub fn validate_catalog(catalog: &Catalog) -> Vec<ValidationWarning> {
    let store = &catalog.store;
    let mut warnings = Vec::new();

    for course in store.courses() {
        let questions = store.questions_for_course(course.id);
        if questions.is_empty() {
            warnings.push(ValidationWarning {
                course: Some(course.id),
                message: format!("course '{}' has no questions and cannot be graded", course.name),
            });
        }

        let mut orders = HashSet::new();
        for lesson in store.lessons_for_course(course.id) {
            if !orders.insert(lesson.order) {
                warnings.push(ValidationWarning {
                    course: Some(course.id),
                    message: format!(
                        "course '{}': duplicate lesson order {} ('{}')",
                        course.name, lesson.order, lesson.title
                    ),
                });
            }
        }

        let mut pairs = HashSet::new();
        for enrollment in store.enrollments_for_course(course.id) {
            if !pairs.insert(&enrollment.account) {
                warnings.push(ValidationWarning {
                    course: Some(course.id),
                    message: format!(
                        "account '{}' is enrolled in course '{}' more than once",
                        enrollment.account, course.name
                    ),
                });
            }
        }
    }

    for question in store.questions() {
        let course = question.course;
        if question.choices.is_empty() {
            warnings.push(ValidationWarning {
                course,
                message: format!("question {} has no choices", question.id),
            });
        } else if store
            .correct_choices(question.id)
            .map(|c| c.is_empty())
            .unwrap_or(true)
        {
            warnings.push(ValidationWarning {
                course,
                message: format!(
                    "question {} has no correct choices; answers to it cannot be marked",
                    question.id
                ),
            });
        }
        if course.is_none() {
            let lesson_course = question
                .lesson
                .and_then(|l| store.lesson(l).ok())
                .map(|l| l.course);
            warnings.push(ValidationWarning {
                course: lesson_course,
                message: format!(
                    "question {} is attached to a lesson only and is not counted in course grades",
                    question.id
                ),
            });
        }
    }

    for drift in store.enrollment_drift() {
        warnings.push(ValidationWarning {
            course: Some(drift.course),
            message: format!(
                "course {}: total_enrollment is {} but {} enrollment(s) exist",
                drift.course, drift.recorded, drift.actual
            ),
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[catalog]
id = "demo"
name = "Demo catalog"
description = "Two questions, two learners"
imported_by = "registrar"

[[instructors]]
account = "prof"
total_learners = 2

[[learners]]
account = "alice"
occupation = "developer"
social_link = "https://example.com/alice"

[[learners]]
account = "bob"

[[courses]]
key = "rust-101"
name = "Rust 101"
description = "Ownership and borrowing"
image = "course_images/rust.png"
pub_date = "2024-01-15"
instructors = ["prof"]
passing_grade = 50

[[courses.lessons]]
key = "intro"
title = "Introduction"
order = 1
content = "Hello"

[[courses.questions]]
key = "q1"
text = "Which are integer types?"
lesson = "intro"

[[courses.questions.choices]]
key = "q1-i32"
text = "i32"
correct = true

[[courses.questions.choices]]
key = "q1-u8"
text = "u8"
correct = true

[[courses.questions.choices]]
key = "q1-f64"
text = "f64"

[[courses.questions]]
key = "q2"
text = "Is Rust memory safe?"
grade = 3

[[courses.questions.choices]]
key = "q2-yes"
text = "yes"
correct = true

[[courses.questions.choices]]
key = "q2-no"
text = "no"

[[enrollments]]
key = "alice-rust"
account = "alice"
course = "rust-101"
mode = "honor"
date_enrolled = "2024-02-01"

[[enrollments]]
key = "bob-rust"
account = "bob"
course = "rust-101"

[[submissions]]
key = "alice-1"
enrollment = "alice-rust"
finalized = true

[[submissions.answers]]
question = "q1"
choices = ["q1-i32", "q1-u8"]

[[submissions.answers]]
question = "q2"
choices = ["q2-yes"]

[[submissions]]
key = "bob-1"
enrollment = "bob-rust"

[[submissions.answers]]
question = "q1"
choices = ["q1-i32", "q1-u8", "q1-f64"]
"#;

    #[test]
    fn parse_valid_catalog() {
        let catalog = parse_catalog_str(VALID_TOML, &PathBuf::from("demo.toml")).unwrap();
        assert_eq!(catalog.id, "demo");
        let store = &catalog.store;
        let course = catalog.keys.course("rust-101").unwrap();
        assert_eq!(store.course(course).unwrap().total_enrollment, 2);
        assert_eq!(store.course(course).unwrap().grade, Some(50));
        assert_eq!(store.questions_for_course(course).len(), 2);
        assert_eq!(store.learners().count(), 2);

        let registrar = AccountId::new("registrar");
        assert_eq!(
            store.course(course).unwrap().audit.created_by,
            Some(registrar)
        );

        let alice = catalog.keys.submission("alice-1").unwrap();
        assert!(store.submission(alice).unwrap().finalized);
        assert!((grading::submission_grade(store, alice).unwrap() - 1.0).abs() < 1e-9);

        let bob = catalog.keys.submission("bob-1").unwrap();
        assert!((grading::submission_grade(store, bob).unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(catalog.keys.submission_key(bob), Some("bob-1"));
    }

    #[test]
    fn parse_minimal_catalog() {
        let toml = r#"
[catalog]
id = "minimal"
name = "Minimal"

[[courses]]
key = "c"
"#;
        let catalog = parse_catalog_str(toml, &PathBuf::from("m.toml")).unwrap();
        let course = catalog.keys.course("c").unwrap();
        let course = catalog.store.course(course).unwrap();
        assert_eq!(course.name, "online course");
        assert_eq!(course.grade, None);
    }

    #[test]
    fn course_without_passing_grade_uses_configured_default() {
        let toml = VALID_TOML.replace("passing_grade = 50\n", "");
        let catalog = parse_catalog_str(&toml, &PathBuf::from("demo.toml")).unwrap();
        let store = &catalog.store;
        let course = catalog.keys.course("rust-101").unwrap();
        assert_eq!(store.course(course).unwrap().grade, None);

        let options = grading::GradingOptions {
            default_passing_grade: 60,
            ..Default::default()
        };
        let alice = catalog.keys.submission("alice-1").unwrap();
        let bob = catalog.keys.submission("bob-1").unwrap();

        let card = grading::scorecard(store, alice, &options).unwrap();
        assert_eq!(card.passing_grade, 60);
        assert_eq!(card.passed, Some(true));

        let card = grading::scorecard(store, bob, &options).unwrap();
        assert_eq!(card.passing_grade, 60);
        assert_eq!(card.passed, Some(false));
    }

    #[test]
    fn foreign_choice_in_answer_fails() {
        let toml = VALID_TOML.replace(
            "choices = [\"q2-yes\"]",
            "choices = [\"q1-i32\"]",
        );
        let err = parse_catalog_str(&toml, &PathBuf::from("bad.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("does not belong to question"));
    }

    #[test]
    fn unknown_keys_fail() {
        let toml = VALID_TOML.replace("enrollment = \"bob-rust\"", "enrollment = \"nobody\"");
        let err = parse_catalog_str(&toml, &PathBuf::from("bad.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("unknown enrollment key"));
    }

    #[test]
    fn duplicate_keys_fail() {
        let toml = VALID_TOML.replace("key = \"q1-u8\"", "key = \"q1-i32\"");
        let err = parse_catalog_str(&toml, &PathBuf::from("bad.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate choice key"));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        assert!(parse_catalog_str(bad, &PathBuf::from("bad.toml")).is_err());
    }

    #[test]
    fn validate_clean_catalog() {
        let catalog = parse_catalog_str(VALID_TOML, &PathBuf::from("demo.toml")).unwrap();
        assert!(validate_catalog(&catalog).is_empty());
    }

    #[test]
    fn validate_reports_grading_hazards() {
        let toml = r#"
[catalog]
id = "hazards"
name = "Hazards"

[[courses]]
key = "empty"
name = "Empty"

[[courses]]
key = "shaky"
name = "Shaky"
total_enrollment = 7

[[courses.lessons]]
key = "a"
order = 1

[[courses.lessons]]
key = "b"
order = 1

[[courses.questions]]
key = "no-key"

[[courses.questions.choices]]
key = "x"

[[courses.questions]]
key = "lesson-only"
lesson = "a"
course_scoped = false

[[courses.questions.choices]]
key = "y"
correct = true

[[enrollments]]
key = "e1"
account = "zoe"
course = "shaky"

[[enrollments]]
key = "e2"
account = "zoe"
course = "shaky"
"#;
        let catalog = parse_catalog_str(toml, &PathBuf::from("h.toml")).unwrap();
        let warnings = validate_catalog(&catalog);
        let has = |needle: &str| warnings.iter().any(|w| w.message.contains(needle));
        assert!(has("has no questions"));
        assert!(has("duplicate lesson order"));
        assert!(has("no correct choices"));
        assert!(has("lesson only"));
        assert!(has("more than once"));
        assert!(has("total_enrollment is 7"));
    }

    #[test]
    fn load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("demo.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "not = [toml").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalogs = load_catalog_directory(dir.path()).unwrap();
        assert_eq!(catalogs.len(), 1);
        assert_eq!(catalogs[0].id, "demo");
    }
}
