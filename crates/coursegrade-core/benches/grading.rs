use criterion::{black_box, criterion_group, criterion_main, Criterion};

use coursegrade_core::grading::{scorecard, submission_grade, GradingOptions};
use coursegrade_core::model::{AccountId, NewCourse, NewEnrollment, NewQuestion, SubmissionId};
use coursegrade_core::statistics::compute_aggregate_stats;
use coursegrade_core::store::MemoryStore;

/// Build a course with `questions` four-choice questions and `learners`
/// submissions, each answering every question with a rotating selection.
fn build_store(questions: usize, learners: usize) -> (MemoryStore, Vec<SubmissionId>) {
    let mut store = MemoryStore::new();
    let course = store.create_course(NewCourse::default(), None).unwrap();

    let mut question_choices = Vec::new();
    for q in 0..questions {
        let question = store
            .create_question(
                NewQuestion {
                    text: format!("question {q}"),
                    course: Some(course),
                    ..NewQuestion::default()
                },
                None,
            )
            .unwrap();
        let choices: Vec<_> = (0..4)
            .map(|c| {
                store
                    .add_choice(question, Some(format!("choice {c}")), c % 2 == 0, None)
                    .unwrap()
            })
            .collect();
        question_choices.push((question, choices));
    }

    let mut submissions = Vec::new();
    for l in 0..learners {
        let enrollment = store
            .enroll(NewEnrollment::new(AccountId::new(format!("learner{l}")), course), None)
            .unwrap();
        let submission = store.create_submission(enrollment, None).unwrap();
        for (i, (question, choices)) in question_choices.iter().enumerate() {
            let picked = choices.iter().copied().skip((i + l) % 4).take(2);
            store.record_answer(submission, *question, picked, None).unwrap();
        }
        submissions.push(submission);
    }

    (store, submissions)
}

fn bench_submission_grade(c: &mut Criterion) {
    let mut group = c.benchmark_group("submission_grade");

    for questions in [5, 50, 200] {
        let (store, submissions) = build_store(questions, 1);
        group.bench_function(format!("{questions}_questions"), |b| {
            b.iter(|| submission_grade(black_box(&store), black_box(submissions[0])))
        });
    }

    group.finish();
}

fn bench_scorecards(c: &mut Criterion) {
    let mut group = c.benchmark_group("scorecards");
    let options = GradingOptions::default();
    let (store, submissions) = build_store(20, 100);

    group.bench_function("single", |b| {
        b.iter(|| scorecard(black_box(&store), black_box(submissions[0]), &options))
    });

    let cards: Vec<_> = submissions
        .iter()
        .map(|&s| scorecard(&store, s, &options).unwrap())
        .collect();

    group.bench_function("aggregate_100", |b| {
        b.iter(|| compute_aggregate_stats(black_box(&cards)))
    });

    group.finish();
}

criterion_group!(benches, bench_submission_grade, bench_scorecards);
criterion_main!(benches);
