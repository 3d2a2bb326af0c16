//! The `coursegrade init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("coursegrade.toml").exists() {
        println!("coursegrade.toml already exists, skipping.");
    } else {
        std::fs::write("coursegrade.toml", SAMPLE_CONFIG)?;
        println!("Created coursegrade.toml");
    }

    std::fs::create_dir_all("catalogs")?;
    let example_path = std::path::Path::new("catalogs/example.toml");
    if example_path.exists() {
        println!("catalogs/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_CATALOG)?;
        println!("Created catalogs/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: coursegrade validate --catalog catalogs/example.toml");
    println!("  2. Run: coursegrade grade --catalog catalogs/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# coursegrade configuration

# "unweighted" counts every question once; "weighted" uses question grades.
weighting = "unweighted"
output_dir = "./coursegrade-results"
default_passing_grade = 80
pass_threshold_epsilon = 1e-9
"#;

const EXAMPLE_CATALOG: &str = r#"[catalog]
id = "example"
name = "Example Catalog"
description = "A single course with two questions to get started"

[[instructors]]
account = "instructor"

[[learners]]
account = "learner"
occupation = "student"

[[courses]]
key = "intro"
name = "Introduction"
description = "A first course"
instructors = ["instructor"]
passing_grade = 50

[[courses.lessons]]
key = "welcome"
title = "Welcome"
order = 1

[[courses.questions]]
key = "primes"
text = "Which numbers are prime?"
lesson = "welcome"

[[courses.questions.choices]]
key = "two"
text = "2"
correct = true

[[courses.questions.choices]]
key = "three"
text = "3"
correct = true

[[courses.questions.choices]]
key = "four"
text = "4"

[[courses.questions]]
key = "sky"
text = "Is the sky blue?"

[[courses.questions.choices]]
key = "yes"
text = "Yes"
correct = true

[[courses.questions.choices]]
key = "no"
text = "No"

[[enrollments]]
key = "learner-intro"
account = "learner"
course = "intro"

[[submissions]]
key = "learner-1"
enrollment = "learner-intro"

[[submissions.answers]]
question = "primes"
choices = ["two"]

[[submissions.answers]]
question = "sky"
choices = ["yes"]
"#;
