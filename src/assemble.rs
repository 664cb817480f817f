//! LaTeX document assembly.
//!
//! Stage 2 of the cookbook pipeline. Reads the reconciled table (never
//! modifies it) and produces the complete `.tex` source:
//!
//! ```text
//! preamble.tex (placeholders substituted)
//! \part{Desserts}
//! \chapter{Cakes}
//!   recipe block
//!   recipe block
//! \part{Mains}
//! ...
//! \end{document}
//! ```
//!
//! ## Grouping
//!
//! Sections appear in the order they are first seen in the table, and
//! subsections in the order they are first seen within their section. The
//! table order set by reconciliation is trusted, not re-sorted.
//!
//! ## Recipe Layout
//!
//! Each recipe starts on a new page with its name as a `\section`, a centered
//! subtitle built from the three attributes, then two half-width minipages:
//! the ingredient list on the left and the picture on the right, followed by
//! the steps. List cells are split on `"; "`; steps get a closing period.
//!
//! Cell text is emitted verbatim, so cells may carry LaTeX markup.
//!
//! ## Failure
//!
//! Empty ingredients, steps or attributes print the configured filler text.
//! A recipe without name, section, subsection or picture aborts assembly with
//! [`AssembleError::MalformedRecord`]; nothing is written in that case.

use crate::config::Labels;
use crate::naming::relative_to_root;
use crate::table::{self, Recipe};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("row {row}: required field '{field}' is empty")]
    MalformedRecord { row: usize, field: &'static str },
    #[error("template {path} cannot be read: {source}")]
    TemplateMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// File name of the preamble template inside the tex root.
pub const PREAMBLE_FILENAME: &str = "preamble.tex";

pub const TITLE_PLACEHOLDER: &str = "Book_Title_Placeholder";
pub const AUTHOR_PLACEHOLDER: &str = "Book_Author_Placeholder";
pub const LANGUAGE_PLACEHOLDER: &str = "Language_Placeholder";

/// Separator between list items inside an ingredients or steps cell.
pub const ITEM_DELIMITER: &str = "; ";

const DOCUMENT_END: &str = "\n\\end{document}";

/// Stock preamble printed by `gen-template`.
const STOCK_PREAMBLE: &str = include_str!("../static/preamble.tex");

pub fn stock_preamble() -> &'static str {
    STOCK_PREAMBLE
}

/// A recipe whose structurally required fields are present.
#[derive(Debug, Clone, Copy)]
pub struct RecipeView<'a> {
    pub name: &'a str,
    pub section: &'a str,
    pub subsection: &'a str,
    pub image: &'a str,
    pub recipe: &'a Recipe,
}

impl<'a> RecipeView<'a> {
    /// Borrow `recipe` if it can be rendered. `row` is 1-based.
    pub fn new(recipe: &'a Recipe, row: usize) -> Result<Self, AssembleError> {
        let required = |value: &'a Option<String>, field: &'static str| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .ok_or(AssembleError::MalformedRecord { row, field })
        };
        Ok(Self {
            name: required(&recipe.name, table::RECIPE)?,
            section: required(&recipe.section, table::SECTION)?,
            subsection: required(&recipe.subsection, table::SUBSECTION)?,
            image: required(&recipe.image, table::IMAGE)?,
            recipe,
        })
    }
}

#[derive(Debug)]
pub struct SubsectionBlock<'a> {
    pub title: &'a str,
    pub recipes: Vec<RecipeView<'a>>,
}

#[derive(Debug)]
pub struct SectionBlock<'a> {
    pub title: &'a str,
    pub subsections: Vec<SubsectionBlock<'a>>,
}

/// Recipes grouped by section, then subsection.
#[derive(Debug, Default)]
pub struct Document<'a> {
    pub sections: Vec<SectionBlock<'a>>,
}

impl Document<'_> {
    pub fn recipe_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| &s.subsections)
            .map(|sub| sub.recipes.len())
            .sum()
    }
}

/// Group recipes by section and subsection in first-appearance order.
pub fn group(recipes: &[Recipe]) -> Result<Document<'_>, AssembleError> {
    let mut doc = Document::default();
    for (i, recipe) in recipes.iter().enumerate() {
        let view = RecipeView::new(recipe, i + 1)?;

        let section_idx = match doc.sections.iter().position(|s| s.title == view.section) {
            Some(idx) => idx,
            None => {
                doc.sections.push(SectionBlock {
                    title: view.section,
                    subsections: Vec::new(),
                });
                doc.sections.len() - 1
            }
        };
        let section = &mut doc.sections[section_idx];

        match section
            .subsections
            .iter_mut()
            .find(|sub| sub.title == view.subsection)
        {
            Some(sub) => sub.recipes.push(view),
            None => section.subsections.push(SubsectionBlock {
                title: view.subsection,
                recipes: vec![view],
            }),
        }
    }
    Ok(doc)
}

/// Render one recipe block.
///
/// `tex_root` is stripped from the picture path so the reference resolves
/// from the directory the compiler runs in.
pub fn render_recipe(view: &RecipeView<'_>, labels: &Labels, tex_root: &str) -> String {
    let r = view.recipe;
    let text = |value: &Option<String>| value.clone().unwrap_or_else(|| labels.missing.clone());

    let mut out = String::new();
    out.push_str(&format!("\n\\newpage\n\\section{{{}}}\n", view.name));
    out.push_str(&format!(
        "\\begin{{center}} \\large {} \\end{{center}}\n",
        r.attributes.iter().map(text).collect::<Vec<_>>().join(" - ")
    ));
    out.push_str(&format!("\\subsection{{{}}} \n", labels.ingredients));
    out.push_str("\\begin{minipage}{0.5\\textwidth} \n\\begin{itemize}\n");
    for item in text(&r.ingredients).split(ITEM_DELIMITER) {
        out.push_str(&format!("\\item {}\n", item));
    }
    out.push_str("\\end{itemize}\n\\end{minipage}\n");
    out.push_str("\\begin{minipage}{0.5\\textwidth}\n");
    out.push_str(&format!(
        "\\includegraphics[width=0.9\\linewidth]{{{}}}\n",
        relative_to_root(view.image, tex_root)
    ));
    out.push_str("\\end{minipage}\n\\linespread{1.25}\n");
    out.push_str(&format!("\\subsection{{{}}}\n\\begin{{itemize}}\n", labels.steps));
    for step in text(&r.steps).split(ITEM_DELIMITER) {
        out.push_str(&format!("\\item {}.\n", step));
    }
    out.push_str("\\end{itemize}\n");
    out
}

/// Render all sections, subsections and recipes.
pub fn render_body(doc: &Document<'_>, labels: &Labels, tex_root: &str) -> String {
    let mut body = String::new();
    for section in &doc.sections {
        body.push_str(&format!("\\part{{{}}}\n", section.title));
        for sub in &section.subsections {
            body.push_str(&format!("\\chapter{{{}}}\n", sub.title));
            for view in &sub.recipes {
                body.push_str(&render_recipe(view, labels, tex_root));
            }
        }
    }
    body
}

/// Values substituted into the preamble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    pub title: String,
    pub author: String,
    pub language: String,
}

impl Placeholders {
    /// Literal replacement of the three placeholder tokens.
    pub fn substitute(&self, template: &str) -> String {
        template
            .replace(TITLE_PLACEHOLDER, &self.title)
            .replace(AUTHOR_PLACEHOLDER, &self.author)
            .replace(LANGUAGE_PLACEHOLDER, &self.language)
    }
}

/// Preamble with placeholders filled, then the body, then `\end{document}`.
pub fn assemble(template: &str, placeholders: &Placeholders, body: &str) -> String {
    let preamble = placeholders.substitute(template);
    let mut out = String::with_capacity(preamble.len() + body.len() + DOCUMENT_END.len());
    out.push_str(&preamble);
    out.push_str(body);
    out.push_str(DOCUMENT_END);
    out
}

/// Read `<tex_root>/preamble.tex`.
pub fn load_template(tex_root: &Path) -> Result<String, AssembleError> {
    let path = tex_root.join(PREAMBLE_FILENAME);
    fs::read_to_string(&path).map_err(|source| AssembleError::TemplateMissing { path, source })
}

/// The `.tex` file written for a document stem.
pub fn document_path(tex_root: &Path, stem: &str) -> PathBuf {
    tex_root.join(format!("{stem}.tex"))
}

/// Everything needed to turn a table into LaTeX source.
#[derive(Debug, Clone)]
pub struct AssembleOptions<'a> {
    pub tex_root: &'a Path,
    pub labels: &'a Labels,
    pub placeholders: Placeholders,
}

/// Summary of an assembled document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleSummary {
    /// `(section, [(subsection, recipe names)])` in document order.
    pub outline: Vec<(String, Vec<(String, Vec<String>)>)>,
    pub path: PathBuf,
    pub bytes: usize,
}

impl AssembleSummary {
    pub fn recipe_count(&self) -> usize {
        self.outline
            .iter()
            .flat_map(|(_, subs)| subs)
            .map(|(_, names)| names.len())
            .sum()
    }
}

fn outline(doc: &Document<'_>) -> Vec<(String, Vec<(String, Vec<String>)>)> {
    doc.sections
        .iter()
        .map(|s| {
            let subs = s
                .subsections
                .iter()
                .map(|sub| {
                    let names = sub.recipes.iter().map(|v| v.name.to_string()).collect();
                    (sub.title.to_string(), names)
                })
                .collect();
            (s.title.to_string(), subs)
        })
        .collect()
}

/// Build the full document text. Nothing is written.
///
/// The template is read first so a missing template fails before any body
/// text is generated.
pub fn build_document<'r>(
    recipes: &'r [Recipe],
    options: &AssembleOptions<'_>,
) -> Result<(String, Document<'r>), AssembleError> {
    let template = load_template(options.tex_root)?;
    let doc = group(recipes)?;
    let tex_root = options.tex_root.to_string_lossy();
    let body = render_body(&doc, options.labels, &tex_root);
    debug!(
        sections = doc.sections.len(),
        recipes = doc.recipe_count(),
        "rendered body"
    );
    Ok((assemble(&template, &options.placeholders, &body), doc))
}

/// Build the document and write it to `<tex_root>/<stem>.tex`.
pub fn write_document(
    recipes: &[Recipe],
    options: &AssembleOptions<'_>,
    stem: &str,
) -> Result<AssembleSummary, AssembleError> {
    let (text, doc) = build_document(recipes, options)?;
    let path = document_path(options.tex_root, stem);
    fs::write(&path, &text)?;
    info!(path = %path.display(), bytes = text.len(), "wrote document");
    Ok(AssembleSummary {
        outline: outline(&doc),
        path,
        bytes: text.len(),
    })
}
