//! Content-addressed picture naming.
//!
//! Every recipe picture lives in a single flat directory, `<tex>/pictures/`,
//! under a name derived from the recipe name rather than from the file that
//! was originally supplied:
//!
//! ```text
//! "Lemon Cake"  →  tex/pictures/<sha256("Lemon Cake")>.jpg
//! ```
//!
//! The canonical path is always recomputed from the *current* recipe name and
//! never trusted from the stored table. Renaming a recipe therefore changes
//! its canonical path, which is how the reconciler detects drift.
//!
//! Paths are kept as `/`-separated strings because they round-trip through
//! the recipe table and end up inside LaTeX source, where the host platform's
//! separator is irrelevant. Tables written on Windows (`tex\pictures\…`) are
//! accepted, and stored paths are compared after lexical normalization, so
//! `tex/pictures/a.jpg`, `./tex/pictures/a.jpg` and `tex\pictures\a.jpg` all
//! name the same file.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Name of the picture directory inside the tex root.
pub const PICTURES_DIR: &str = "pictures";

/// Extension of every canonical picture.
pub const PICTURE_EXTENSION: &str = "jpg";

/// Hex-encoded SHA-256 of the UTF-8 recipe name plus the picture extension.
///
/// ```text
/// picture_file_name("Lemon Cake") → "3f1c…e9.jpg"   (64 hex chars + ".jpg")
/// ```
pub fn picture_file_name(recipe_name: &str) -> String {
    let digest = Sha256::digest(recipe_name.as_bytes());
    format!("{:x}.{}", digest, PICTURE_EXTENSION)
}

/// Replace every `\` with `/`.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Lexical normalization: `/` separators, no `.` segments, no repeated or
/// trailing separators. A leading `/` is kept; `..` is left alone since it
/// cannot be resolved without touching the filesystem.
///
/// - `normalize_path("./tex//pictures/")` → `"tex/pictures"`
/// - `normalize_path("/tmp/./tex")` → `"/tmp/tex"`
/// - `normalize_path(".")` → `""`
pub fn normalize_path(path: &str) -> String {
    let path = normalize_separators(path);
    let absolute = path.starts_with('/');
    let joined = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Whether two stored paths point at the same location after lexical
/// normalization.
pub fn same_location(a: &str, b: &str) -> bool {
    normalize_path(a) == normalize_path(b)
}

/// Express `path` relative to `root`.
///
/// Both sides are normalized with [`normalize_path`] first. If `path` does not live under
/// `root` it is returned normalized but otherwise untouched.
///
/// - `relative_to_root("tex/pictures/a.jpg", "tex")` → `"pictures/a.jpg"`
/// - `relative_to_root("tex\\pictures\\a.jpg", "tex")` → `"pictures/a.jpg"`
/// - `relative_to_root("elsewhere/a.jpg", "tex")` → `"elsewhere/a.jpg"`
pub fn relative_to_root(path: &str, root: &str) -> String {
    let path = normalize_path(path);
    let root = normalize_path(root);
    if root.is_empty() || root == "/" {
        return path;
    }
    match path.strip_prefix(root.as_str()) {
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/').to_string(),
        _ => path,
    }
}

/// The picture directory of a tex root and the canonical paths inside it.
#[derive(Debug, Clone)]
pub struct PictureStore {
    tex_root: String,
}

impl PictureStore {
    /// `tex_root` is normalized lexically, so `tex`, `./tex` and `tex/` give
    /// the same canonical paths.
    pub fn new(tex_root: &Path) -> Self {
        Self {
            tex_root: normalize_path(&tex_root.to_string_lossy()),
        }
    }

    /// The normalized tex root as a `/`-separated string.
    pub fn tex_root(&self) -> &str {
        &self.tex_root
    }

    /// Directory holding all canonical pictures.
    pub fn pictures_dir(&self) -> PathBuf {
        PathBuf::from(self.join(PICTURES_DIR))
    }

    /// Canonical stored path for a recipe's picture: `<tex>/pictures/<hash>.jpg`.
    pub fn canonical_path(&self, recipe_name: &str) -> String {
        self.join(&format!("{}/{}", PICTURES_DIR, picture_file_name(recipe_name)))
    }

    fn join(&self, rest: &str) -> String {
        if self.tex_root.is_empty() {
            rest.to_string()
        } else {
            format!("{}/{}", self.tex_root.trim_end_matches('/'), rest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_deterministic() {
        assert_eq!(picture_file_name("Lemon Cake"), picture_file_name("Lemon Cake"));
    }

    #[test]
    fn file_name_is_fixed_width_hex() {
        let name = picture_file_name("Choc Cake");
        let (stem, ext) = name.split_once('.').unwrap();
        assert_eq!(stem.len(), 64);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(ext, "jpg");
    }

    #[test]
    fn known_digest() {
        // sha256("abc")
        assert_eq!(
            picture_file_name("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad.jpg"
        );
    }

    #[test]
    fn different_names_differ() {
        assert_ne!(picture_file_name("Lemon Cake"), picture_file_name("Lemon cake"));
    }

    #[test]
    fn non_ascii_names_hash_their_utf8_bytes() {
        let name = picture_file_name("Crème brûlée");
        assert_eq!(name.len(), 68);
        assert_ne!(name, picture_file_name("Creme brulee"));
    }

    #[test]
    fn canonical_path_under_pictures_dir() {
        let store = PictureStore::new(Path::new("tex"));
        let path = store.canonical_path("Lemon Cake");
        assert_eq!(path, format!("tex/pictures/{}", picture_file_name("Lemon Cake")));
    }

    #[test]
    fn canonical_path_normalizes_windows_root() {
        let store = PictureStore::new(Path::new("books\\tex\\"));
        assert!(store.canonical_path("x").starts_with("books/tex/pictures/"));
    }

    #[test]
    fn equivalent_roots_give_the_same_canonical_path() {
        let plain = PictureStore::new(Path::new("tex")).canonical_path("Soup");
        for root in ["./tex", "tex/", ".\\tex\\", "tex/./"] {
            assert_eq!(PictureStore::new(Path::new(root)).canonical_path("Soup"), plain);
        }
        let absolute = PictureStore::new(Path::new("/books/./tex"));
        assert!(absolute.canonical_path("Soup").starts_with("/books/tex/pictures/"));
    }

    #[test]
    fn current_dir_root_has_no_prefix() {
        let store = PictureStore::new(Path::new("."));
        assert_eq!(store.canonical_path("x"), format!("pictures/{}", picture_file_name("x")));
    }

    #[test]
    fn normalize_drops_dot_segments() {
        assert_eq!(normalize_path("./tex//pictures/"), "tex/pictures");
        assert_eq!(normalize_path("/tmp/./tex"), "/tmp/tex");
        assert_eq!(normalize_path("."), "");
        assert_eq!(normalize_path("../tex"), "../tex");
    }

    #[test]
    fn pictures_dir_joins_root() {
        let store = PictureStore::new(Path::new("tex"));
        assert_eq!(store.pictures_dir(), PathBuf::from("tex/pictures"));
    }

    #[test]
    fn same_location_ignores_separators() {
        assert!(same_location("tex\\pictures\\a.jpg", "tex/pictures/a.jpg"));
        assert!(same_location("./tex/pictures/a.jpg", "tex/pictures/a.jpg"));
        assert!(!same_location("tex/pictures/a.jpg", "tex/pictures/b.jpg"));
    }

    #[test]
    fn relative_strips_root() {
        assert_eq!(relative_to_root("tex/pictures/a.jpg", "tex"), "pictures/a.jpg");
    }

    #[test]
    fn relative_strips_windows_root() {
        assert_eq!(relative_to_root("tex\\pictures\\a.jpg", "tex"), "pictures/a.jpg");
        assert_eq!(relative_to_root("tex/pictures/a.jpg", "tex\\"), "pictures/a.jpg");
    }

    #[test]
    fn relative_leaves_foreign_paths() {
        assert_eq!(relative_to_root("other\\a.jpg", "tex"), "other/a.jpg");
    }

    #[test]
    fn relative_does_not_strip_partial_segment() {
        assert_eq!(relative_to_root("texts/a.jpg", "tex"), "texts/a.jpg");
    }

    #[test]
    fn relative_to_current_dir() {
        assert_eq!(relative_to_root("./pictures/a.jpg", "."), "pictures/a.jpg");
    }
}
