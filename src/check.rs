//! Read-only audit of a recipe table against the picture store.
//!
//! Reports everything `build` would have to fix or would fail on, without
//! touching any file:
//!
//! | Finding | Meaning |
//! |---|---|
//! | missing | named recipe with no picture; `build` would ask for one |
//! | drifted | picture path differs from the canonical path of the name |
//! | absent | referenced picture file does not exist |
//! | orphans | files in `<tex>/pictures` no recipe's canonical path points at |
//! | malformed | row that assembly would reject |

use crate::assemble::{AssembleError, RecipeView};
use crate::naming::{PictureStore, normalize_path, normalize_separators, same_location};
use crate::table::Recipe;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    pub recipe: String,
    pub stored: String,
    pub canonical: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malformed {
    /// 1-based data row.
    pub row: usize,
    pub field: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub recipes: usize,
    pub missing: Vec<String>,
    pub drifted: Vec<Drift>,
    /// `(recipe, stored path)`
    pub absent: Vec<(String, String)>,
    pub orphans: Vec<PathBuf>,
    pub malformed: Vec<Malformed>,
}

impl CheckReport {
    /// Whether `build` would run without asking, moving or failing.
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
            && self.drifted.is_empty()
            && self.absent.is_empty()
            && self.malformed.is_empty()
    }
}

pub fn check(store: &PictureStore, recipes: &[Recipe]) -> CheckReport {
    let mut report = CheckReport {
        recipes: recipes.len(),
        ..CheckReport::default()
    };
    let mut referenced = HashSet::new();

    for (i, recipe) in recipes.iter().enumerate() {
        let Some(name) = recipe.name.as_deref() else {
            // Unnamed rows are dropped by reconciliation.
            continue;
        };
        let canonical = store.canonical_path(name);
        referenced.insert(canonical.clone());

        match recipe.image.as_deref() {
            None => report.missing.push(name.to_string()),
            Some(stored) => {
                if !same_location(stored, &canonical) {
                    report.drifted.push(Drift {
                        recipe: name.to_string(),
                        stored: stored.to_string(),
                        canonical,
                    });
                }
                if !Path::new(&normalize_separators(stored)).is_file() {
                    report.absent.push((name.to_string(), stored.to_string()));
                }
                if let Err(AssembleError::MalformedRecord { row, field }) =
                    RecipeView::new(recipe, i + 1)
                {
                    report.malformed.push(Malformed { row, field });
                }
            }
        }
    }

    report.orphans = orphans(&store.pictures_dir(), &referenced);
    report
}

/// Files under `dir` whose path is not in `referenced`, sorted.
fn orphans(dir: &Path, referenced: &HashSet<String>) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| !referenced.contains(&normalize_path(&p.to_string_lossy())))
        .collect();
    found.sort();
    found
}
