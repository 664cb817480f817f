//! # Cookbook
//!
//! Turns a recipe table and a folder of pictures into a typeset cookbook.
//! The table is the data source: one row per recipe, grouped into sections
//! and subsections, with ingredients and steps as `"; "`-separated lists.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Reconcile  Recipes.csv + pictures  →  Recipes.csv, Config.csv   (sorted, canonical picture paths)
//! 2. Assemble   Recipes.csv + tex/preamble.tex  →  tex/<name>.tex
//! 3. Compile    tex/<name>.tex  →  <name>.pdf
//! ```
//!
//! Each stage reads what the previous one wrote, so every stage can be run on
//! its own (`reconcile`, `assemble`) and the intermediate files are plain
//! text you can inspect or edit by hand.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `cookbook.toml` loading, merging with stock defaults, validation |
//! | [`table`] | Recipe and order tables: name-bound columns, CSV/TSV/XLSX persistence |
//! | [`naming`] | Content-addressed picture paths derived from recipe names |
//! | [`pictures`] | Copying, transcoding and moving files in the picture store |
//! | [`resolve`] | Where pictures for recipes without one come from (prompt, JSON mapping) |
//! | [`reconcile`] | Stage 1: repair drift, fill missing pictures, apply order, sort, persist |
//! | [`assemble`] | Stage 2: group recipes and render the LaTeX document |
//! | [`compile`] | Stage 3: run the LaTeX compiler and deliver the PDF |
//! | [`check`] | Read-only audit of the table against the picture store |
//! | [`output`] | CLI output formatting for every stage |
//!
//! # Design Decisions
//!
//! ## Pictures Named by Recipe
//!
//! A picture's file name is the SHA-256 of its recipe name. The table stores
//! the path, but the path is never trusted: it is recomputed from the current
//! name on every run. Renaming a recipe in the table is enough to have its
//! picture follow it. See [`naming`].
//!
//! ## The Table Is Rewritten
//!
//! Reconciliation writes its result back to the recipe table (sorted, with
//! canonical picture paths) and regenerates the order table. Columns it does
//! not know about are carried through unchanged, and order values keep the
//! text they were typed with. A second run on a settled CSV or TSV table
//! writes byte-identical files; a spreadsheet keeps identical cells.
//!
//! ## Cells Are LaTeX
//!
//! Cell text goes into the document verbatim. Authors can use markup such as
//! `\textbf{}` in ingredients; a literal `%` or `&` must be escaped in the
//! table.

pub mod assemble;
pub mod check;
pub mod compile;
pub mod config;
pub mod naming;
pub mod output;
pub mod pictures;
pub mod reconcile;
pub mod resolve;
pub mod table;

#[cfg(test)]
pub(crate) mod test_helpers;
