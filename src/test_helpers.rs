//! Shared test utilities for the cookbook test suite.
//!
//! Builders for recipes and order tables, plus a scratch book directory with
//! the stock preamble in place.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_book();
//! let photo = write_picture(tmp.path(), "photos/lemon.jpg", b"lemon");
//! let recipes = vec![
//!     with_image(recipe("Desserts", "Cakes", "Lemon Cake"), &photo.to_string_lossy()),
//!     ordered(recipe("Mains", "Soups", "Broth"), Some("1")),
//! ];
//! assert_eq!(names(&recipes), vec!["Lemon Cake", "Broth"]);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::assemble::{PREAMBLE_FILENAME, stock_preamble};
use crate::table::{OrderEntry, OrderKey, OrderTable, Recipe, TableFormat};

// =========================================================================
// Fixture setup
// =========================================================================

/// Temp directory with `tex/preamble.tex` holding the stock preamble.
pub fn setup_book() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let tex = tmp.path().join("tex");
    fs::create_dir_all(&tex).unwrap();
    fs::write(tex.join(PREAMBLE_FILENAME), stock_preamble()).unwrap();
    tmp
}

/// Write `bytes` to `path`, joined onto `dir` unless already absolute.
/// Parent directories are created.
pub fn write_picture(dir: &Path, path: &str, bytes: &[u8]) -> PathBuf {
    let full = dir.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&full, bytes).unwrap();
    full
}

// =========================================================================
// Builders
// =========================================================================

/// A recipe with only its grouping and name filled in.
pub fn recipe(section: &str, subsection: &str, name: &str) -> Recipe {
    Recipe {
        section: Some(section.to_string()),
        subsection: Some(subsection.to_string()),
        name: Some(name.to_string()),
        ..Recipe::default()
    }
}

pub fn with_image(mut recipe: Recipe, image: &str) -> Recipe {
    recipe.image = Some(image.to_string());
    recipe
}

/// Set the order key from its cell text.
pub fn ordered(mut recipe: Recipe, order: Option<&str>) -> Recipe {
    recipe.order = order.map(OrderKey::parse);
    recipe
}

/// In-memory order table from `(section, subsection, order)` triples.
/// An empty order string means no order.
pub fn order_table(entries: &[(&str, &str, &str)]) -> OrderTable {
    OrderTable {
        path: PathBuf::from("Config.csv"),
        format: TableFormat::Csv,
        entries: entries
            .iter()
            .map(|(section, subsection, order)| OrderEntry {
                section: Some(section.to_string()),
                subsection: Some(subsection.to_string()),
                order: (!order.is_empty()).then(|| OrderKey::parse(order)),
            })
            .collect(),
    }
}

// =========================================================================
// Extractors
// =========================================================================

/// Recipe names in table order. Unnamed rows show as `""`.
pub fn names(recipes: &[Recipe]) -> Vec<&str> {
    recipes
        .iter()
        .map(|r| r.name.as_deref().unwrap_or(""))
        .collect()
}
