//! The `coursegrade validate` command.

use std::path::PathBuf;

use anyhow::Result;

use coursegrade_core::catalog::{load_catalogs, validate_catalog};
use coursegrade_core::repository::Repository;

pub fn execute(catalog_path: PathBuf) -> Result<()> {
    let catalogs = load_catalogs(&catalog_path)?;

    let mut total_warnings = 0;

    for catalog in &catalogs {
        let store = &catalog.store;
        println!(
            "Catalog: {} ({} courses, {} questions, {} submissions)",
            catalog.name,
            store.courses().len(),
            store.questions().count(),
            store.submissions().count()
        );

        let warnings = validate_catalog(catalog);
        for w in &warnings {
            let prefix = w
                .course
                .and_then(|id| store.course(id).ok())
                .map(|c| format!("  [{}]", c.name))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All catalogs valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
