//! Recipe table reconciliation.
//!
//! Stage 1 of the cookbook pipeline. Brings the recipe table and the picture
//! store into a consistent state, then sorts the table:
//!
//! ```text
//! check conflicts → repair drift → resolve missing → apply order → sort
//! ```
//!
//! After a successful run every non-empty `Image` cell equals the canonical
//! path of its recipe name ([`PictureStore::canonical_path`]). Persisting is a
//! separate step ([`persist`]) so callers only commit a table that reconciled
//! completely.
//!
//! ## Drift
//!
//! A recipe renamed after its picture was filed still points at the hash of
//! its old name. The canonical path is always recomputed from the current
//! name, so the mismatch is detected and the file is moved. Paths that differ
//! only in spelling (separator style, `.` segments, or another path to the same
//! file) are rewritten in the table without touching the filesystem.
//!
//! Drift is repaired before missing pictures are resolved. A recipe renamed
//! from "Tart" to "Cake" still holds the picture filed under the hash of
//! "Tart"; a new "Tart" row can only get its picture once that file has moved
//! to the hash of "Cake".
//!
//! Moves are planned and validated before any file is touched: a missing
//! source is [`ReconcileError::ResourceUnavailable`], and an occupied
//! destination or two sources competing for one destination is
//! [`ReconcileError::PictureConflict`]. Imports are held to the same rule.
//! Nothing is ever overwritten silently.
//!
//! ## Parallelism
//!
//! Planned moves are grouped by source file. Groups touch disjoint files, so
//! they run in parallel on the rayon pool; the table is updated only after
//! every group finished.
//!
//! ## Idempotence
//!
//! With stable names and all pictures present, a second run performs no file
//! operation and [`persist`] writes byte-identical tables.

use crate::naming::{PictureStore, normalize_path, normalize_separators, same_location};
use crate::pictures::{self, ImportKind, PictureError, Quality};
use crate::resolve::ImageResolver;
use crate::table::{OrderTable, Recipe, RecipeTable, TableError};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("resource unavailable for recipe '{recipe}': {source}")]
    ResourceUnavailable {
        recipe: String,
        #[source]
        source: PictureError,
    },
    #[error("picture conflict at {path}: {reason}")]
    PictureConflict { path: String, reason: String },
    #[error("could not obtain a picture for recipe '{recipe}': {source}")]
    Resolver {
        recipe: String,
        #[source]
        source: std::io::Error,
    },
}

/// A picture that was imported or moved during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureChange {
    pub recipe: String,
    /// Previous stored path (moves) or supplied source (imports).
    pub from: String,
    pub to: String,
}

/// Everything reconciliation did, for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub imported: Vec<PictureChange>,
    /// Imports that had to be re-encoded to JPEG.
    pub transcoded: usize,
    pub moved: Vec<PictureChange>,
    /// Image cells rewritten without a file operation (path spelling only).
    pub rewritten: usize,
    /// Recipe names still without a picture.
    pub unresolved: Vec<String>,
    /// Rows dropped because they have no recipe name.
    pub dropped: usize,
    /// Rows in the reconciled table.
    pub recipes: usize,
}

impl ReconcileReport {
    /// Number of files created or moved.
    pub fn file_operations(&self) -> usize {
        self.imported.len() + self.moved.len()
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} imported, {} moved, {} unresolved ({} recipes)",
            self.imported.len(),
            self.moved.len(),
            self.unresolved.len(),
            self.recipes
        )?;
        if self.dropped > 0 {
            write!(f, ", {} unnamed rows dropped", self.dropped)?;
        }
        Ok(())
    }
}

/// Owns the picture-store side of reconciliation.
pub struct Reconciler<'r> {
    store: PictureStore,
    quality: Quality,
    resolver: &'r mut dyn ImageResolver,
}

impl<'r> Reconciler<'r> {
    pub fn new(store: PictureStore, quality: Quality, resolver: &'r mut dyn ImageResolver) -> Self {
        Self {
            store,
            quality,
            resolver,
        }
    }

    pub fn store(&self) -> &PictureStore {
        &self.store
    }

    /// Run every reconciliation step on `table` in order. Does not persist.
    pub fn reconcile(
        &mut self,
        table: &mut RecipeTable,
        order: Option<&OrderTable>,
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::default();
        info!(rows = table.recipes.len(), "reconciling {}", table.path.display());

        check_conflicts(&self.store, &table.recipes)?;
        self.reconcile_drift(&mut table.recipes, &mut report)?;
        self.resolve_missing(&mut table.recipes, &mut report)?;
        report.dropped = apply_order(&mut table.recipes, order);
        sort(&mut table.recipes);
        report.recipes = table.recipes.len();

        if !report.unresolved.is_empty() {
            warn!(
                count = report.unresolved.len(),
                "recipes still without a picture: {}",
                report.unresolved.join(", ")
            );
        }
        info!("{}", report);
        Ok(report)
    }

    /// Give every named recipe without a picture one from the resolver.
    ///
    /// The resolver is asked at most once per recipe name. Recipes whose name
    /// already has a picture on another row reuse that row's path.
    ///
    /// A picture is never imported onto a path that another recipe still
    /// stores or that already holds a file; both are
    /// [`ReconcileError::PictureConflict`].
    pub fn resolve_missing(
        &mut self,
        recipes: &mut [Recipe],
        report: &mut ReconcileReport,
    ) -> Result<(), ReconcileError> {
        let mut known: HashMap<String, String> = recipes
            .iter()
            .filter_map(|r| Some((r.name.clone()?, r.image.clone()?)))
            .collect();
        // normalized stored path → name of the row storing it
        let claimed: HashMap<String, String> = recipes
            .iter()
            .filter_map(|r| Some((normalize_path(r.image.as_deref()?), r.name.clone()?)))
            .collect();
        let mut declined: HashSet<String> = HashSet::new();

        for recipe in recipes.iter_mut().filter(|r| r.image.is_none()) {
            let Some(name) = recipe.name.clone() else {
                debug!("skipping unnamed row without picture");
                continue;
            };
            if let Some(existing) = known.get(&name) {
                debug!(recipe = %name, path = %existing, "sharing picture with same-named row");
                recipe.image = Some(existing.clone());
                continue;
            }
            if declined.contains(&name) {
                continue;
            }

            let source = self
                .resolver
                .source_for(&name)
                .map_err(|source| ReconcileError::Resolver {
                    recipe: name.clone(),
                    source,
                })?;
            let Some(source) = source else {
                debug!(recipe = %name, "no picture supplied");
                report.unresolved.push(name.clone());
                declined.insert(name);
                continue;
            };

            let dest = self.store.canonical_path(&name);
            if let Some(holder) = claimed.get(&normalize_path(&dest)).filter(|h| **h != name) {
                return Err(ReconcileError::PictureConflict {
                    path: dest,
                    reason: format!("cannot import for '{name}': still the picture of '{holder}'"),
                });
            }
            if Path::new(&dest).exists() {
                return Err(ReconcileError::PictureConflict {
                    path: dest,
                    reason: format!("cannot import for '{name}': destination already exists"),
                });
            }
            let kind = pictures::import_picture(&source, Path::new(&dest), self.quality)
                .map_err(|source| ReconcileError::ResourceUnavailable {
                    recipe: name.clone(),
                    source,
                })?;
            info!(recipe = %name, from = %source.display(), to = %dest, ?kind, "imported picture");
            if kind == ImportKind::Transcoded {
                report.transcoded += 1;
            }
            report.imported.push(PictureChange {
                recipe: name.clone(),
                from: source.display().to_string(),
                to: dest.clone(),
            });
            recipe.image = Some(dest.clone());
            known.insert(name, dest);
        }
        Ok(())
    }

    /// Move every picture that is not at its recipe's canonical path.
    pub fn reconcile_drift(
        &self,
        recipes: &mut [Recipe],
        report: &mut ReconcileReport,
    ) -> Result<(), ReconcileError> {
        let plan = plan_moves(&self.store, recipes)?;

        for (index, canonical) in &plan.rewrites {
            recipes[*index].image = Some(canonical.clone());
        }
        report.rewritten += plan.rewrites.len();

        if plan.groups.is_empty() {
            return Ok(());
        }

        debug!(groups = plan.groups.len(), "moving drifted pictures");
        plan.groups
            .par_iter()
            .map(|group| group.execute())
            .collect::<Result<Vec<()>, ReconcileError>>()?;

        // Barrier: table updates only after all file operations completed.
        for group in &plan.groups {
            for target in &group.targets {
                report.moved.push(PictureChange {
                    recipe: target.recipe.clone(),
                    from: group.source.clone(),
                    to: target.path.clone(),
                });
            }
        }
        for (index, canonical) in plan.updates {
            recipes[index].image = Some(canonical);
        }
        Ok(())
    }
}

/// Reject tables where two different names map to one canonical path.
fn check_conflicts(store: &PictureStore, recipes: &[Recipe]) -> Result<(), ReconcileError> {
    find_collision(recipes, |name| store.canonical_path(name))
}

fn find_collision(
    recipes: &[Recipe],
    path_of: impl Fn(&str) -> String,
) -> Result<(), ReconcileError> {
    let mut claims: HashMap<String, &str> = HashMap::new();
    for name in recipes.iter().filter_map(|r| r.name.as_deref()) {
        let path = path_of(name);
        match claims.get(&path) {
            Some(first) if *first != name => {
                return Err(ReconcileError::PictureConflict {
                    path,
                    reason: format!("recipes '{first}' and '{name}' hash to the same picture"),
                });
            }
            Some(_) => {}
            None => {
                claims.insert(path, name);
            }
        }
    }
    Ok(())
}

#[derive(Debug)]
struct MoveTarget {
    recipe: String,
    path: String,
}

/// All moves out of one source file: copies to every target but the last,
/// then a rename to the last.
#[derive(Debug)]
struct MoveGroup {
    source: String,
    targets: Vec<MoveTarget>,
}

impl MoveGroup {
    fn execute(&self) -> Result<(), ReconcileError> {
        let source = Path::new(&self.source);
        let unavailable = |recipe: &str, source: PictureError| ReconcileError::ResourceUnavailable {
            recipe: recipe.to_string(),
            source,
        };
        if let Some((last, rest)) = self.targets.split_last() {
            for target in rest {
                pictures::copy_picture(source, Path::new(&target.path))
                    .map_err(|e| unavailable(&target.recipe, e))?;
                info!(recipe = %target.recipe, from = %self.source, to = %target.path, "copied picture");
            }
            pictures::move_picture(source, Path::new(&last.path))
                .map_err(|e| unavailable(&last.recipe, e))?;
            info!(recipe = %last.recipe, from = %self.source, to = %last.path, "moved picture");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MovePlan {
    /// Rows whose stored path only differs in separator style.
    rewrites: Vec<(usize, String)>,
    /// Rows to point at their canonical path once the moves are done.
    updates: Vec<(usize, String)>,
    groups: Vec<MoveGroup>,
}

fn plan_moves(store: &PictureStore, recipes: &[Recipe]) -> Result<MovePlan, ReconcileError> {
    let mut plan = MovePlan::default();
    // canonical target → normalized source
    let mut sources_by_target: HashMap<String, String> = HashMap::new();
    let mut targets_by_source: BTreeMap<String, Vec<MoveTarget>> = BTreeMap::new();

    for (index, recipe) in recipes.iter().enumerate() {
        let (Some(name), Some(current)) = (recipe.name.as_deref(), recipe.image.as_deref()) else {
            continue;
        };
        let canonical = store.canonical_path(name);
        if current == canonical {
            continue;
        }
        if same_location(current, &canonical) || pictures::same_file(current, &canonical) {
            plan.rewrites.push((index, canonical));
            continue;
        }

        let source = normalize_separators(current);
        match sources_by_target.get(&canonical) {
            Some(existing) if *existing == source => {}
            Some(existing) => {
                return Err(ReconcileError::PictureConflict {
                    path: canonical,
                    reason: format!(
                        "rows named '{name}' point at different pictures ({existing} and {source})"
                    ),
                });
            }
            None => {
                if !Path::new(&source).is_file() {
                    return Err(ReconcileError::ResourceUnavailable {
                        recipe: name.to_string(),
                        source: PictureError {
                            path: source.into(),
                            reason: "stored picture does not exist".to_string(),
                        },
                    });
                }
                if Path::new(&canonical).exists() {
                    return Err(ReconcileError::PictureConflict {
                        path: canonical,
                        reason: format!(
                            "cannot move {source} for '{name}': destination already exists"
                        ),
                    });
                }
                sources_by_target.insert(canonical.clone(), source.clone());
                targets_by_source.entry(source).or_default().push(MoveTarget {
                    recipe: name.to_string(),
                    path: canonical.clone(),
                });
            }
        }
        plan.updates.push((index, canonical));
    }

    plan.groups = targets_by_source
        .into_iter()
        .map(|(source, targets)| MoveGroup { source, targets })
        .collect();
    Ok(plan)
}

/// Join group order onto recipes and drop rows without a name.
///
/// Returns the number of dropped rows.
pub fn apply_order(recipes: &mut Vec<Recipe>, order: Option<&OrderTable>) -> usize {
    let before = recipes.len();
    recipes.retain(|r| r.name.is_some());
    for recipe in recipes.iter_mut() {
        recipe.order = order
            .and_then(|o| o.lookup(recipe.section.as_deref(), recipe.subsection.as_deref()))
            .cloned();
    }
    let dropped = before - recipes.len();
    if dropped > 0 {
        warn!(dropped, "dropped rows without a recipe name");
    }
    dropped
}

fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort by `(order, section, subsection, name)`; empty values last.
pub fn sort(recipes: &mut [Recipe]) {
    recipes.sort_by(|a, b| {
        nulls_last(&a.order, &b.order)
            .then_with(|| nulls_last(&a.section, &b.section))
            .then_with(|| nulls_last(&a.subsection, &b.subsection))
            .then_with(|| nulls_last(&a.name, &b.name))
    });
}

/// Write the recipe table back, and the order table when one was supplied.
pub fn persist(table: &RecipeTable, order: Option<&OrderTable>) -> Result<(), TableError> {
    table.save()?;
    info!(path = %table.path.display(), rows = table.recipes.len(), "saved recipe table");
    if let Some(order) = order {
        let derived = OrderTable {
            path: order.path.clone(),
            format: order.format,
            entries: OrderTable::derive_entries(&table.recipes),
        };
        derived.save()?;
        info!(path = %derived.path.display(), rows = derived.entries.len(), "saved order table");
    }
    Ok(())
}
