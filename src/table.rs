//! Recipe and order tables: loading, name-based column binding, persistence.
//!
//! ## Recipe table
//!
//! A delimited-text file with a header row. The required columns are bound by
//! name once, at load time, so their position in the file does not matter:
//!
//! ```text
//! Section,Subsection,Recipe,Attr1,Attr2,Attr3,Ingredients,Steps,Image
//! Desserts,Cakes,Lemon Cake,4 people,1h,Easy,Flour; Sugar,Mix; Bake,tex/pictures/….jpg
//! ```
//!
//! Any additional columns are carried through untouched, so rewriting the
//! table only ever changes the `Image` column and the row order.
//!
//! ## Order table
//!
//! Optional, with columns `Section, Subsection, Order`. Each `(section,
//! subsection)` pair gets a sort key that takes precedence over the
//! alphabetical order of sections.
//!
//! ## Formats
//!
//! The format follows the file extension:
//!
//! | Extension | Read | Write |
//! |---|---|---|
//! | `.csv` | `csv`, comma-separated | same |
//! | `.tsv` | `csv`, tab-separated | same |
//! | `.xlsx` | first worksheet via `calamine` | one worksheet via `rust_xlsxwriter` |
//!
//! Anything else is rejected with [`TableError::FormatMismatch`] before any
//! work is done. Empty cells are `None`.
//!
//! Spreadsheet cells are read as their displayed text. On write, a cell whose
//! text reads back unchanged as a number (`4`, `1.5`) is stored as a number and
//! everything else as a string, so `01` stays `01`. Delimited tables are saved
//! byte-identically when nothing changed; a workbook keeps the same cells, but
//! its container records the time it was written.

use calamine::{Data, Reader, Xlsx, XlsxError, open_workbook};
use rust_xlsxwriter::Workbook;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} does not match the expected table format: {reason}")]
    FormatMismatch { path: PathBuf, reason: String },
}

impl TableError {
    fn mismatch(path: &Path, reason: impl Into<String>) -> Self {
        TableError::FormatMismatch {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

pub const SECTION: &str = "Section";
pub const SUBSECTION: &str = "Subsection";
pub const RECIPE: &str = "Recipe";
pub const ATTRIBUTES: [&str; 3] = ["Attr1", "Attr2", "Attr3"];
pub const INGREDIENTS: &str = "Ingredients";
pub const STEPS: &str = "Steps";
pub const IMAGE: &str = "Image";
pub const ORDER: &str = "Order";

/// On-disk table format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    Xlsx,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(TableFormat::Csv),
            Some("tsv") => Ok(TableFormat::Tsv),
            Some("xlsx") => Ok(TableFormat::Xlsx),
            Some(other) => Err(TableError::mismatch(
                path,
                format!("unsupported table format '.{other}' (expected .csv, .tsv or .xlsx)"),
            )),
            None => Err(TableError::mismatch(path, "missing file extension")),
        }
    }

    /// Field delimiter of the text formats; `None` for spreadsheets.
    fn delimiter(self) -> Option<u8> {
        match self {
            TableFormat::Csv => Some(b','),
            TableFormat::Tsv => Some(b'\t'),
            TableFormat::Xlsx => None,
        }
    }
}

/// One recipe row.
///
/// Every field is optional because the table is user-edited; which fields are
/// actually required is decided by the stage that consumes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipe {
    pub section: Option<String>,
    pub subsection: Option<String>,
    pub name: Option<String>,
    pub attributes: [Option<String>; 3],
    pub ingredients: Option<String>,
    pub steps: Option<String>,
    pub image: Option<String>,
    /// Sort key joined from the order table. Never persisted.
    pub order: Option<OrderKey>,
    /// Cells of columns this crate does not interpret, in header order.
    pub extra: Vec<Option<String>>,
}

/// Column indices of the required fields, bound once from the header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    section: usize,
    subsection: usize,
    name: usize,
    attributes: [usize; 3],
    ingredients: usize,
    steps: usize,
    image: usize,
    /// Indices of every other column, in header order.
    extra: Vec<usize>,
}

impl Columns {
    /// Bind required columns by name. A missing column is a format mismatch.
    pub fn bind(headers: &[String], path: &Path) -> Result<Self, TableError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| TableError::mismatch(path, format!("missing column '{name}'")))
        };
        let columns = Columns {
            section: find(SECTION)?,
            subsection: find(SUBSECTION)?,
            name: find(RECIPE)?,
            attributes: [find(ATTRIBUTES[0])?, find(ATTRIBUTES[1])?, find(ATTRIBUTES[2])?],
            ingredients: find(INGREDIENTS)?,
            steps: find(STEPS)?,
            image: find(IMAGE)?,
            extra: Vec::new(),
        };
        let known = columns.known();
        let extra = (0..headers.len()).filter(|i| !known.contains(i)).collect();
        Ok(Columns { extra, ..columns })
    }

    fn known(&self) -> [usize; 9] {
        [
            self.section,
            self.subsection,
            self.name,
            self.attributes[0],
            self.attributes[1],
            self.attributes[2],
            self.ingredients,
            self.steps,
            self.image,
        ]
    }

    fn read(&self, cells: &[Option<String>]) -> Recipe {
        let cell = |i: usize| cells.get(i).cloned().flatten();
        Recipe {
            section: cell(self.section),
            subsection: cell(self.subsection),
            name: cell(self.name),
            attributes: [
                cell(self.attributes[0]),
                cell(self.attributes[1]),
                cell(self.attributes[2]),
            ],
            ingredients: cell(self.ingredients),
            steps: cell(self.steps),
            image: cell(self.image),
            order: None,
            extra: self.extra.iter().map(|&i| cell(i)).collect(),
        }
    }

    fn write(&self, recipe: &Recipe, width: usize) -> Vec<String> {
        let mut cells = vec![String::new(); width];
        let mut put = |i: usize, value: &Option<String>| {
            if let Some(v) = value {
                cells[i] = v.clone();
            }
        };
        put(self.section, &recipe.section);
        put(self.subsection, &recipe.subsection);
        put(self.name, &recipe.name);
        for (i, attr) in self.attributes.iter().zip(&recipe.attributes) {
            put(*i, attr);
        }
        put(self.ingredients, &recipe.ingredients);
        put(self.steps, &recipe.steps);
        put(self.image, &recipe.image);
        for (i, value) in self.extra.iter().zip(&recipe.extra) {
            put(*i, value);
        }
        cells
    }
}

/// The loaded recipe table: original header plus bound rows.
#[derive(Debug, Clone)]
pub struct RecipeTable {
    pub path: PathBuf,
    pub format: TableFormat,
    headers: Vec<String>,
    columns: Columns,
    pub recipes: Vec<Recipe>,
}

impl RecipeTable {
    /// Build an in-memory table with the standard header, for callers that
    /// do not start from a file.
    pub fn new(path: PathBuf, recipes: Vec<Recipe>) -> Result<Self, TableError> {
        let format = TableFormat::from_path(&path)?;
        let headers = standard_headers();
        let columns = Columns::bind(&headers, &path)?;
        Ok(Self {
            path,
            format,
            headers,
            columns,
            recipes,
        })
    }

    /// Load and bind a recipe table.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let format = TableFormat::from_path(path)?;
        let (headers, rows) = read_rows(path, format)?;
        let columns = Columns::bind(&headers, path)?;
        let recipes = rows.iter().map(|row| columns.read(row)).collect();
        Ok(Self {
            path: path.to_path_buf(),
            format,
            headers,
            columns,
            recipes,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.recipes
            .iter()
            .map(|r| self.columns.write(r, self.headers.len()))
    }

    /// Serialize a delimited table to text, without any order column.
    pub fn to_text(&self) -> Result<String, TableError> {
        write_text(&self.path, self.format, &self.headers, self.rows())
    }

    /// Serialize to file contents in the table's own format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TableError> {
        encode(&self.path, self.format, &self.headers, self.rows())
    }

    /// Write the table back to the file it was loaded from.
    pub fn save(&self) -> Result<(), TableError> {
        write_file(&self.path, self.to_bytes()?)
    }
}

/// The header row written for tables created from scratch.
pub fn standard_headers() -> Vec<String> {
    [SECTION, SUBSECTION, RECIPE]
        .into_iter()
        .chain(ATTRIBUTES)
        .chain([INGREDIENTS, STEPS, IMAGE])
        .map(String::from)
        .collect()
}

// =============================================================================
// Order table
// =============================================================================

/// Placement key from the order table.
///
/// Values that parse as numbers compare numerically and come before textual
/// values, which compare lexicographically. The trimmed cell text is kept and
/// written back as is, so `01` or `1.50` survive a save.
#[derive(Debug, Clone)]
pub struct OrderKey {
    raw: String,
    number: Option<f64>,
}

impl OrderKey {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let number = raw.parse::<f64>().ok().filter(|n| n.is_finite());
        Self { raw, number }
    }

    /// The numeric value, when the text is a finite number.
    pub fn number(&self) -> Option<f64> {
        self.number
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.number, other.number) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.raw.cmp(&other.raw),
        }
    }
}

/// Keys are equal when they sort equal: `1` and `1.0` name the same place.
impl PartialEq for OrderKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderKey {}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One `(section, subsection) → order` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEntry {
    pub section: Option<String>,
    pub subsection: Option<String>,
    pub order: Option<OrderKey>,
}

/// The optional order table.
#[derive(Debug, Clone)]
pub struct OrderTable {
    pub path: PathBuf,
    pub format: TableFormat,
    pub entries: Vec<OrderEntry>,
}

impl OrderTable {
    /// Load the order table. Returns `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, TableError> {
        if !path.exists() {
            return Ok(None);
        }
        let format = TableFormat::from_path(path)?;
        let (headers, rows) = read_rows(path, format)?;
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| TableError::mismatch(path, format!("missing column '{name}'")))
        };
        let (section, subsection, order) = (find(SECTION)?, find(SUBSECTION)?, find(ORDER)?);
        let entries = rows
            .iter()
            .map(|row| {
                let cell = |i: usize| row.get(i).cloned().flatten();
                OrderEntry {
                    section: cell(section),
                    subsection: cell(subsection),
                    order: cell(order).as_deref().map(OrderKey::parse),
                }
            })
            .collect();
        Ok(Some(Self {
            path: path.to_path_buf(),
            format,
            entries,
        }))
    }

    /// Look up the order of a group. The first matching entry wins.
    pub fn lookup(&self, section: Option<&str>, subsection: Option<&str>) -> Option<&OrderKey> {
        self.entries
            .iter()
            .find(|e| e.section.as_deref() == section && e.subsection.as_deref() == subsection)
            .and_then(|e| e.order.as_ref())
    }

    /// Deduplicated `(section, subsection, order)` rows derived from `recipes`,
    /// in recipe order.
    pub fn derive_entries(recipes: &[Recipe]) -> Vec<OrderEntry> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for r in recipes {
            let entry = OrderEntry {
                section: r.section.clone(),
                subsection: r.subsection.clone(),
                order: r.order.clone(),
            };
            let key = (
                entry.section.clone(),
                entry.subsection.clone(),
                entry.order.as_ref().map(|o| o.to_string()),
            );
            if seen.insert(key) {
                entries.push(entry);
            }
        }
        entries
    }

    fn headers() -> Vec<String> {
        [SECTION, SUBSECTION, ORDER].map(String::from).to_vec()
    }

    fn rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.entries.iter().map(|e| {
            vec![
                e.section.clone().unwrap_or_default(),
                e.subsection.clone().unwrap_or_default(),
                e.order.as_ref().map(|o| o.to_string()).unwrap_or_default(),
            ]
        })
    }

    pub fn to_text(&self) -> Result<String, TableError> {
        write_text(&self.path, self.format, &Self::headers(), self.rows())
    }

    pub fn save(&self) -> Result<(), TableError> {
        let bytes = encode(&self.path, self.format, &Self::headers(), self.rows())?;
        write_file(&self.path, bytes)
    }
}

// =============================================================================
// File I/O
// =============================================================================

type Rows = Vec<Vec<Option<String>>>;

fn read_rows(path: &Path, format: TableFormat) -> Result<(Vec<String>, Rows), TableError> {
    match format.delimiter() {
        Some(delimiter) => read_delimited(path, delimiter),
        None => read_sheet(path),
    }
}

fn encode(
    path: &Path,
    format: TableFormat,
    headers: &[String],
    rows: impl Iterator<Item = Vec<String>>,
) -> Result<Vec<u8>, TableError> {
    match format {
        TableFormat::Xlsx => write_sheet(path, headers, rows),
        TableFormat::Csv | TableFormat::Tsv => {
            write_text(path, format, headers, rows).map(String::into_bytes)
        }
    }
}

fn write_file(path: &Path, bytes: Vec<u8>) -> Result<(), TableError> {
    fs::write(path, bytes).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<(Vec<String>, Rows), TableError> {
    let bytes = fs::read(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes.as_slice());

    let headers = reader
        .headers()
        .map_err(|e| TableError::mismatch(path, e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| TableError::mismatch(path, e.to_string()))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(
            record
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect(),
        );
    }
    Ok((headers, rows))
}

fn write_text(
    path: &Path,
    format: TableFormat,
    headers: &[String],
    rows: impl Iterator<Item = Vec<String>>,
) -> Result<String, TableError> {
    let delimiter = format
        .delimiter()
        .ok_or_else(|| TableError::mismatch(path, "spreadsheet tables have no text form"))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    let mismatch = |e: csv::Error| TableError::mismatch(path, e.to_string());
    writer.write_record(headers).map_err(mismatch)?;
    for row in rows {
        writer.write_record(&row).map_err(mismatch)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| TableError::mismatch(path, e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| TableError::mismatch(path, e.to_string()))
}

/// Header and data rows of the first worksheet, as displayed text.
fn read_sheet(path: &Path) -> Result<(Vec<String>, Rows), TableError> {
    let sheet_error = |e: XlsxError| match e {
        XlsxError::Io(source) => TableError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => TableError::mismatch(path, other.to_string()),
    };
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(sheet_error)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| TableError::mismatch(path, "workbook has no worksheet"))?
        .map_err(sheet_error)?;

    let mut lines = range.rows();
    let headers = lines
        .next()
        .ok_or_else(|| TableError::mismatch(path, "missing header row"))?
        .iter()
        .map(|cell| cell.to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for line in lines {
        let cells: Vec<Option<String>> = line
            .iter()
            .map(|cell| match cell {
                Data::Empty => None,
                other => Some(other.to_string()).filter(|text| !text.is_empty()),
            })
            .collect();
        if cells.iter().all(Option::is_none) {
            continue;
        }
        rows.push(cells);
    }
    Ok((headers, rows))
}

/// The number a cell holds when its text reads back unchanged.
fn sheet_number(text: &str) -> Option<f64> {
    text.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && n.to_string() == text)
}

fn write_sheet(
    path: &Path,
    headers: &[String],
    rows: impl Iterator<Item = Vec<String>>,
) -> Result<Vec<u8>, TableError> {
    let sheet_error = |e: rust_xlsxwriter::XlsxError| TableError::mismatch(path, e.to_string());
    let too_large = || TableError::mismatch(path, "table does not fit in a worksheet");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, row) in std::iter::once(headers.to_vec()).chain(rows).enumerate() {
        let r = u32::try_from(r).map_err(|_| too_large())?;
        for (c, text) in row.iter().enumerate() {
            if text.is_empty() {
                continue;
            }
            let c = u16::try_from(c).map_err(|_| too_large())?;
            match sheet_number(text) {
                Some(n) => sheet.write_number(r, c, n).map_err(sheet_error)?,
                None => sheet.write_string(r, c, text).map_err(sheet_error)?,
            };
        }
    }
    workbook.save_to_buffer().map_err(sheet_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "Section,Subsection,Recipe,Attr1,Attr2,Attr3,Ingredients,Steps,Image\n";

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(TableFormat::from_path(Path::new("a.csv")).unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::from_path(Path::new("a.TSV")).unwrap(), TableFormat::Tsv);
        assert_eq!(TableFormat::from_path(Path::new("a.xlsx")).unwrap(), TableFormat::Xlsx);
    }

    #[test]
    fn unknown_extension_is_format_mismatch() {
        let err = TableFormat::from_path(Path::new("Recipes.ods")).unwrap_err();
        assert!(matches!(err, TableError::FormatMismatch { .. }));
    }

    #[test]
    fn load_binds_by_name() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "r.csv",
            "Recipe,Image,Steps,Ingredients,Attr3,Attr2,Attr1,Subsection,Section\n\
             Soup,,Boil,Water,c,b,a,Soups,Mains\n",
        );
        let table = RecipeTable::load(&path).unwrap();
        let r = &table.recipes[0];
        assert_eq!(r.section.as_deref(), Some("Mains"));
        assert_eq!(r.subsection.as_deref(), Some("Soups"));
        assert_eq!(r.name.as_deref(), Some("Soup"));
        assert_eq!(r.attributes[0].as_deref(), Some("a"));
        assert_eq!(r.attributes[2].as_deref(), Some("c"));
        assert_eq!(r.ingredients.as_deref(), Some("Water"));
        assert_eq!(r.image, None);
    }

    #[test]
    fn empty_cells_are_none() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "r.csv", &format!("{HEADER}Desserts,Cakes,Lemon Cake,,,,,,\n"));
        let table = RecipeTable::load(&path).unwrap();
        let r = &table.recipes[0];
        assert_eq!(r.attributes, [None, None, None]);
        assert_eq!(r.ingredients, None);
        assert_eq!(r.image, None);
    }

    #[test]
    fn missing_column_is_format_mismatch() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "r.csv", "Section,Subsection,Recipe\nA,B,C\n");
        let err = RecipeTable::load(&path).unwrap_err();
        match err {
            TableError::FormatMismatch { reason, .. } => assert!(reason.contains("Attr1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn ragged_rows_are_format_mismatch() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "r.csv", &format!("{HEADER}A,B,C\n"));
        assert!(matches!(
            RecipeTable::load(&path).unwrap_err(),
            TableError::FormatMismatch { .. }
        ));
    }

    #[test]
    fn extra_columns_survive_save() {
        let tmp = TempDir::new().unwrap();
        let content = "Section,Notes,Subsection,Recipe,Attr1,Attr2,Attr3,Ingredients,Steps,Image\n\
                       Desserts,grandma's,Cakes,Lemon Cake,a,b,c,Flour; Sugar,Mix; Bake,tex/pictures/x.jpg\n";
        let path = write(&tmp, "r.csv", content);
        let table = RecipeTable::load(&path).unwrap();
        assert_eq!(table.recipes[0].extra, vec![Some("grandma's".to_string())]);
        table.save().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn quoted_cells_round_trip() {
        let tmp = TempDir::new().unwrap();
        let content = format!("{HEADER}Desserts,Cakes,\"Cake, lemon\",a,b,c,x,y,z\n");
        let path = write(&tmp, "r.csv", &content);
        let table = RecipeTable::load(&path).unwrap();
        assert_eq!(table.recipes[0].name.as_deref(), Some("Cake, lemon"));
        assert_eq!(table.to_text().unwrap(), content);
    }

    #[test]
    fn tsv_uses_tabs() {
        let tmp = TempDir::new().unwrap();
        let header = HEADER.replace(',', "\t");
        let path = write(&tmp, "r.tsv", &format!("{header}A\tB\tC\t\t\t\t\t\t\n"));
        let table = RecipeTable::load(&path).unwrap();
        assert_eq!(table.recipes[0].name.as_deref(), Some("C"));
        assert!(table.to_text().unwrap().starts_with("Section\tSubsection"));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "r.csv", &format!("{HEADER},,,,,,,,\nA,B,C,,,,,,\n"));
        let table = RecipeTable::load(&path).unwrap();
        assert_eq!(table.recipes.len(), 1);
    }

    #[test]
    fn order_key_numbers_before_text() {
        let mut keys = vec![
            OrderKey::parse("b"),
            OrderKey::parse("10"),
            OrderKey::parse("2"),
            OrderKey::parse("a"),
        ];
        keys.sort();
        let sorted: Vec<_> = keys.iter().map(OrderKey::as_str).collect();
        assert_eq!(sorted, vec!["2", "10", "a", "b"]);
    }

    #[test]
    fn order_key_keeps_written_text() {
        assert_eq!(OrderKey::parse("01").to_string(), "01");
        assert_eq!(OrderKey::parse("1.50").to_string(), "1.50");
        assert_eq!(OrderKey::parse("1e1").to_string(), "1e1");
        assert_eq!(OrderKey::parse("1e1").number(), Some(10.0));
    }

    #[test]
    fn order_key_is_trimmed() {
        assert_eq!(OrderKey::parse(" first ").as_str(), "first");
        assert_eq!(OrderKey::parse(" 2 ").as_str(), "2");
        assert_eq!(OrderKey::parse(" 2 ").number(), Some(2.0));
    }

    #[test]
    fn numerically_equal_keys_are_equal() {
        assert_eq!(OrderKey::parse("1"), OrderKey::parse("1.0"));
        assert_ne!(OrderKey::parse("1"), OrderKey::parse("one"));
    }

    #[test]
    fn order_table_save_keeps_order_text() {
        let tmp = TempDir::new().unwrap();
        let content = "Section,Subsection,Order\nDesserts,Cakes,01\nMains,Soups,1.50\nDrinks,Hot,1e1\n";
        let path = write(&tmp, "Config.csv", content);
        let table = OrderTable::load(&path).unwrap().unwrap();
        table.save().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn order_table_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(OrderTable::load(&tmp.path().join("Config.csv")).unwrap().is_none());
    }

    #[test]
    fn order_table_lookup() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "Config.csv",
            "Section,Subsection,Order\nDesserts,Cakes,1\nMains,Soups,2\n",
        );
        let table = OrderTable::load(&path).unwrap().unwrap();
        assert_eq!(
            table.lookup(Some("Mains"), Some("Soups")).and_then(OrderKey::number),
            Some(2.0)
        );
        assert_eq!(table.lookup(Some("Mains"), Some("Salads")), None);
    }

    #[test]
    fn order_table_missing_column_is_format_mismatch() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "Config.csv", "Section,Subsection\nA,B\n");
        assert!(matches!(
            OrderTable::load(&path).unwrap_err(),
            TableError::FormatMismatch { .. }
        ));
    }

    #[test]
    fn derive_entries_deduplicates() {
        let recipe = |s: &str, sub: &str, order: Option<OrderKey>| Recipe {
            section: Some(s.into()),
            subsection: Some(sub.into()),
            name: Some("x".into()),
            order,
            ..Recipe::default()
        };
        let recipes = vec![
            recipe("Desserts", "Cakes", Some(OrderKey::parse("1"))),
            recipe("Desserts", "Cakes", Some(OrderKey::parse("1"))),
            recipe("Mains", "Soups", None),
        ];
        let entries = OrderTable::derive_entries(&recipes);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].order, None);
    }

    #[test]
    fn order_table_text_leaves_missing_order_blank() {
        let table = OrderTable {
            path: PathBuf::from("Config.csv"),
            format: TableFormat::Csv,
            entries: vec![OrderEntry {
                section: Some("Mains".into()),
                subsection: Some("Soups".into()),
                order: None,
            }],
        };
        assert_eq!(table.to_text().unwrap(), "Section,Subsection,Order\nMains,Soups,\n");
    }

    // =========================================================================
    // Spreadsheets
    // =========================================================================

    fn sheet_recipe(name: &str, attrs: [&str; 3], image: Option<&str>) -> Recipe {
        Recipe {
            section: Some("Desserts".into()),
            subsection: Some("Cakes".into()),
            name: Some(name.into()),
            attributes: attrs.map(|a| (!a.is_empty()).then(|| a.to_string())),
            ingredients: Some("Flour; Sugar".into()),
            steps: Some("Mix; Bake".into()),
            image: image.map(String::from),
            ..Recipe::default()
        }
    }

    #[test]
    fn spreadsheet_recipe_table_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Recipes.xlsx");
        let recipes = vec![
            sheet_recipe("Cake, lemon", ["4", "1.5h", ""], Some("tex/pictures/a.jpg")),
            sheet_recipe("Sponge", ["08", "", "Easy"], None),
        ];
        RecipeTable::new(path.clone(), recipes.clone()).unwrap().save().unwrap();

        let table = RecipeTable::load(&path).unwrap();

        assert_eq!(table.format, TableFormat::Xlsx);
        assert_eq!(table.headers(), standard_headers().as_slice());
        assert_eq!(table.recipes, recipes);
    }

    #[test]
    fn spreadsheet_keeps_extra_columns() {
        let tmp = TempDir::new().unwrap();
        let csv = write(
            &tmp,
            "r.csv",
            "Section,Notes,Subsection,Recipe,Attr1,Attr2,Attr3,Ingredients,Steps,Image\n\
             Desserts,grandma's,Cakes,Lemon Cake,a,b,c,Flour,Mix,\n",
        );
        let mut table = RecipeTable::load(&csv).unwrap();
        table.path = tmp.path().join("r.xlsx");
        table.format = TableFormat::Xlsx;
        table.save().unwrap();

        let reloaded = RecipeTable::load(&table.path).unwrap();

        assert_eq!(reloaded.headers(), table.headers());
        assert_eq!(reloaded.recipes, table.recipes);
        assert_eq!(reloaded.recipes[0].extra, vec![Some("grandma's".to_string())]);
    }

    #[test]
    fn spreadsheet_order_table_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Config.xlsx");
        let entry = |section: &str, order: &str| OrderEntry {
            section: Some(section.into()),
            subsection: Some("Main".into()),
            order: (!order.is_empty()).then(|| OrderKey::parse(order)),
        };
        let table = OrderTable {
            path: path.clone(),
            format: TableFormat::Xlsx,
            entries: vec![entry("Desserts", "2"), entry("Mains", "01"), entry("Drinks", "")],
        };
        table.save().unwrap();

        let loaded = OrderTable::load(&path).unwrap().unwrap();

        assert_eq!(loaded.format, TableFormat::Xlsx);
        assert_eq!(loaded.entries, table.entries);
        let written: Vec<_> = loaded
            .entries
            .iter()
            .map(|e| e.order.as_ref().map(OrderKey::as_str))
            .collect();
        assert_eq!(written, vec![Some("2"), Some("01"), None]);
    }

    #[test]
    fn spreadsheet_has_no_text_form() {
        let table = RecipeTable::new(PathBuf::from("Recipes.xlsx"), Vec::new()).unwrap();
        assert!(matches!(table.to_text().unwrap_err(), TableError::FormatMismatch { .. }));
    }

    #[test]
    fn corrupt_spreadsheet_is_format_mismatch() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "Recipes.xlsx", "not a workbook");
        assert!(matches!(
            RecipeTable::load(&path).unwrap_err(),
            TableError::FormatMismatch { .. }
        ));
    }

    #[test]
    fn only_exact_numbers_are_stored_as_numbers() {
        assert_eq!(sheet_number("4"), Some(4.0));
        assert_eq!(sheet_number("1.5"), Some(1.5));
        assert_eq!(sheet_number("01"), None);
        assert_eq!(sheet_number("1.50"), None);
        assert_eq!(sheet_number("4 people"), None);
    }
}
