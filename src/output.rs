//! CLI output formatting for all pipeline stages.
//!
//! Output leads with the recipe book's own structure (sections, subsections,
//! recipe names) and shows file paths as indented context lines, so a run
//! reads like a table of contents rather than a file listing.
//!
//! # Output Format
//!
//! ## Reconcile
//!
//! ```text
//! Pictures
//!     Lemon Cake ← photos/lemon.png
//!         To: tex/pictures/3f1c….jpg
//!     Choc Cake moved
//!         From: tex/pictures/old.jpg
//!         To: tex/pictures/9a0e….jpg
//! Unresolved
//!     Soup
//! 1 imported, 1 moved, 1 unresolved (12 recipes)
//! ```
//!
//! ## Assemble
//!
//! ```text
//! 001 Desserts
//!     001 Cakes (2 recipes)
//!         001 Choc Cake
//!         002 Lemon Cake
//! 002 Mains
//!     001 Soups (1 recipe)
//!         001 Broth
//! Wrote tex/Recipes.tex (3 recipes)
//! ```
//!
//! ## Check
//!
//! ```text
//! Missing pictures
//!     Soup
//! Drifted
//!     Choc Cake
//!         Stored: tex/pictures/old.jpg
//!         Canonical: tex/pictures/9a0e….jpg
//! Orphans
//!     tex/pictures/stray.jpg
//! 12 recipes: 1 missing, 1 drifted, 0 absent, 1 orphan, 0 malformed
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::assemble::AssembleSummary;
use crate::check::CheckReport;
use crate::reconcile::ReconcileReport;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

// ============================================================================
// Stage 1: Reconcile
// ============================================================================

pub fn format_reconcile_output(report: &ReconcileReport) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.imported.is_empty() || !report.moved.is_empty() {
        lines.push("Pictures".to_string());
    }
    for change in &report.imported {
        lines.push(format!("{}{} ← {}", indent(1), change.recipe, change.from));
        lines.push(format!("{}To: {}", indent(2), change.to));
    }
    for change in &report.moved {
        lines.push(format!("{}{} moved", indent(1), change.recipe));
        lines.push(format!("{}From: {}", indent(2), change.from));
        lines.push(format!("{}To: {}", indent(2), change.to));
    }
    if report.rewritten > 0 {
        lines.push(format!(
            "{}{} rewritten in place",
            indent(1),
            plural(report.rewritten, "path", "paths")
        ));
    }

    if !report.unresolved.is_empty() {
        lines.push("Unresolved".to_string());
        for name in &report.unresolved {
            lines.push(format!("{}{}", indent(1), name));
        }
    }

    lines.push(report.to_string());
    lines
}

pub fn print_reconcile_output(report: &ReconcileReport) {
    for line in format_reconcile_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Stage 2: Assemble
// ============================================================================

pub fn format_assemble_output(summary: &AssembleSummary) -> Vec<String> {
    let mut lines = Vec::new();
    for (si, (section, subsections)) in summary.outline.iter().enumerate() {
        lines.push(format!("{} {}", format_index(si + 1), section));
        for (ui, (subsection, names)) in subsections.iter().enumerate() {
            lines.push(format!(
                "{}{} {} ({})",
                indent(1),
                format_index(ui + 1),
                subsection,
                plural(names.len(), "recipe", "recipes")
            ));
            for (ri, name) in names.iter().enumerate() {
                lines.push(format!("{}{} {}", indent(2), format_index(ri + 1), name));
            }
        }
    }
    lines.push(format!(
        "Wrote {} ({})",
        summary.path.display(),
        plural(summary.recipe_count(), "recipe", "recipes")
    ));
    lines
}

pub fn print_assemble_output(summary: &AssembleSummary) {
    for line in format_assemble_output(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Stage 3: Compile
// ============================================================================

pub fn format_compile_output(pdf: &Path, passes: u32) -> Vec<String> {
    vec![format!(
        "Compiled {} ({})",
        pdf.display(),
        plural(passes as usize, "pass", "passes")
    )]
}

pub fn print_compile_output(pdf: &Path, passes: u32) {
    for line in format_compile_output(pdf, passes) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check_output(report: &CheckReport) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.missing.is_empty() {
        lines.push("Missing pictures".to_string());
        for name in &report.missing {
            lines.push(format!("{}{}", indent(1), name));
        }
    }
    if !report.drifted.is_empty() {
        lines.push("Drifted".to_string());
        for drift in &report.drifted {
            lines.push(format!("{}{}", indent(1), drift.recipe));
            lines.push(format!("{}Stored: {}", indent(2), drift.stored));
            lines.push(format!("{}Canonical: {}", indent(2), drift.canonical));
        }
    }
    if !report.absent.is_empty() {
        lines.push("Absent files".to_string());
        for (name, path) in &report.absent {
            lines.push(format!("{}{}", indent(1), name));
            lines.push(format!("{}Stored: {}", indent(2), path));
        }
    }
    if !report.orphans.is_empty() {
        lines.push("Orphans".to_string());
        for path in &report.orphans {
            lines.push(format!("{}{}", indent(1), path.display()));
        }
    }
    if !report.malformed.is_empty() {
        lines.push("Malformed rows".to_string());
        for m in &report.malformed {
            lines.push(format!("{}row {}: {} is empty", indent(1), m.row, m.field));
        }
    }

    lines.push(format!(
        "{}: {} missing, {} drifted, {} absent, {}, {} malformed",
        plural(report.recipes, "recipe", "recipes"),
        report.missing.len(),
        report.drifted.len(),
        report.absent.len(),
        plural(report.orphans.len(), "orphan", "orphans"),
        report.malformed.len()
    ));
    lines
}

pub fn print_check_output(report: &CheckReport) {
    for line in format_check_output(report) {
        println!("{}", line);
    }
}
