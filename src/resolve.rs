//! Where pictures for recipes without one come from.
//!
//! The reconciler never talks to the console itself. It asks an
//! [`ImageResolver`] for a source file, once per recipe name, and gets back
//! zero or one path:
//!
//! - [`PromptResolver`] asks on a terminal (or any `BufRead`/`Write` pair).
//! - [`MappingResolver`] looks names up in a JSON file:
//!
//!   ```json
//!   { "Lemon Cake": "photos/lemon.jpg", "Choc Cake": "/tmp/choc.png" }
//!   ```
//!
//! - [`NoResolver`] never supplies anything (read-only commands).
//! - Any `FnMut(&str) -> io::Result<Option<PathBuf>>` closure.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

pub trait ImageResolver {
    /// Source picture for `recipe_name`, or `None` to leave the recipe unresolved.
    fn source_for(&mut self, recipe_name: &str) -> io::Result<Option<PathBuf>>;
}

impl<F> ImageResolver for F
where
    F: FnMut(&str) -> io::Result<Option<PathBuf>>,
{
    fn source_for(&mut self, recipe_name: &str) -> io::Result<Option<PathBuf>> {
        self(recipe_name)
    }
}

/// Supplies nothing; every missing picture stays missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResolver;

impl ImageResolver for NoResolver {
    fn source_for(&mut self, _recipe_name: &str) -> io::Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Interactive resolver: one prompt line per recipe, blank answer skips.
pub struct PromptResolver<R, W> {
    input: R,
    output: W,
}

impl PromptResolver<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptResolver<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> ImageResolver for PromptResolver<R, W> {
    fn source_for(&mut self, recipe_name: &str) -> io::Result<Option<PathBuf>> {
        write!(self.output, "Enter path of the picture ({}): ", recipe_name)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(parse_answer(&line))
    }
}

/// Trim whitespace and the quotes terminals add around dropped files.
fn parse_answer(line: &str) -> Option<PathBuf> {
    let trimmed = line.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            trimmed
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(trimmed);
    (!unquoted.is_empty()).then(|| PathBuf::from(unquoted))
}

/// Resolver backed by a recipe name → path map.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct MappingResolver {
    sources: HashMap<String, PathBuf>,
}

impl MappingResolver {
    pub fn new(sources: HashMap<String, PathBuf>) -> Self {
        Self { sources }
    }

    /// Load a JSON object mapping recipe names to picture paths.
    ///
    /// Relative paths are resolved against the directory of the mapping file.
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut mapping: Self = serde_json::from_str(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if let Some(base) = path.parent() {
            for source in mapping.sources.values_mut() {
                if source.is_relative() {
                    *source = base.join(&*source);
                }
            }
        }
        Ok(mapping)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ImageResolver for MappingResolver {
    fn source_for(&mut self, recipe_name: &str) -> io::Result<Option<PathBuf>> {
        Ok(self.sources.get(recipe_name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn prompt_reads_one_line_per_request() {
        let mut out = Vec::new();
        let mut resolver = PromptResolver::new(Cursor::new("a.jpg\n\n"), &mut out);

        assert_eq!(resolver.source_for("Lemon Cake").unwrap(), Some(PathBuf::from("a.jpg")));
        assert_eq!(resolver.source_for("Choc Cake").unwrap(), None);
        drop(resolver);

        let prompt = String::from_utf8(out).unwrap();
        assert!(prompt.contains("Enter path of the picture (Lemon Cake): "));
        assert!(prompt.contains("(Choc Cake)"));
    }

    #[test]
    fn prompt_at_eof_skips() {
        let mut resolver = PromptResolver::new(Cursor::new(""), Vec::new());
        assert_eq!(resolver.source_for("x").unwrap(), None);
    }

    #[test]
    fn answer_strips_quotes() {
        assert_eq!(parse_answer("  '/tmp/my photo.jpg' \n"), Some(PathBuf::from("/tmp/my photo.jpg")));
        assert_eq!(parse_answer("\"C:\\pics\\a.jpg\"\r\n"), Some(PathBuf::from("C:\\pics\\a.jpg")));
        assert_eq!(parse_answer("   \n"), None);
    }

    #[test]
    fn mapping_resolves_relative_to_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("images.json");
        fs::write(&path, r#"{"Lemon Cake": "lemon.jpg", "Choc Cake": "/abs/choc.png"}"#).unwrap();

        let mut resolver = MappingResolver::load(&path).unwrap();

        assert_eq!(resolver.len(), 2);
        assert_eq!(
            resolver.source_for("Lemon Cake").unwrap(),
            Some(tmp.path().join("lemon.jpg"))
        );
        assert_eq!(
            resolver.source_for("Choc Cake").unwrap(),
            Some(PathBuf::from("/abs/choc.png"))
        );
        assert_eq!(resolver.source_for("Soup").unwrap(), None);
    }

    #[test]
    fn mapping_rejects_non_object() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("images.json");
        fs::write(&path, "[1, 2]").unwrap();
        let err = MappingResolver::load(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn closures_are_resolvers() {
        let mut calls = 0;
        let mut resolver = |name: &str| -> io::Result<Option<PathBuf>> {
            calls += 1;
            Ok(Some(PathBuf::from(format!("{name}.jpg"))))
        };
        assert_eq!(
            ImageResolver::source_for(&mut resolver, "x").unwrap(),
            Some(PathBuf::from("x.jpg"))
        );
        assert_eq!(calls, 1);
    }

    #[test]
    fn no_resolver_supplies_nothing() {
        assert_eq!(NoResolver.source_for("x").unwrap(), None);
    }
}
