use clap::{Parser, Subcommand};
use cookbook::assemble::{self, AssembleOptions, Placeholders};
use cookbook::config::{self, BookConfig, Overrides};
use cookbook::naming::PictureStore;
use cookbook::pictures::Quality;
use cookbook::reconcile::{self, ReconcileReport, Reconciler};
use cookbook::resolve::{ImageResolver, MappingResolver, PromptResolver};
use cookbook::table::{OrderTable, RecipeTable};
use cookbook::{check, compile, output};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "cookbook")]
#[command(about = "Typeset a cookbook from a recipe table and pictures")]
#[command(long_about = "\
Typeset a cookbook from a recipe table and pictures

The recipe table is the data source. Each row is one recipe; rows are grouped
into parts (Section) and chapters (Subsection). Ingredients and Steps are
lists separated by \"; \".

Working directory layout:

  Recipes.csv                     # Recipe table (.csv, .tsv or .xlsx)
  Config.csv                      # Order table: Section,Subsection,Order (optional)
  cookbook.toml                   # Settings (optional)
  tex/
  ├── preamble.tex                # LaTeX preamble with placeholders
  └── pictures/                   # Managed picture store (<sha256 of name>.jpg)

Recipe table columns (any order, extra columns are kept):
  Section, Subsection, Recipe, Attr1, Attr2, Attr3, Ingredients, Steps, Image

Recipes without a picture are asked for interactively, or looked up in the
JSON file given with --images. Pictures are stored under the hash of the
recipe name; renaming a recipe moves its picture on the next run.

Run 'cookbook gen-template > tex/preamble.tex' for a starting preamble and
'cookbook gen-config' for a documented cookbook.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Babel language of the book
    #[arg(short = 'l', long, global = true)]
    language: Option<String>,

    /// Book title
    #[arg(short = 't', long, global = true)]
    title: Option<String>,

    /// Heading of the ingredients list
    #[arg(short = 'i', long, global = true)]
    ingredients: Option<String>,

    /// Book author
    #[arg(short = 'a', long, global = true)]
    author: Option<String>,

    /// Heading of the steps list
    #[arg(short = 's', long, global = true)]
    steps: Option<String>,

    /// LaTeX directory holding preamble.tex and pictures/
    #[arg(short = 'x', long, global = true)]
    tex: Option<PathBuf>,

    /// Recipe table
    #[arg(short = 'd', long, global = true)]
    database: Option<PathBuf>,

    /// Output PDF
    #[arg(short = 'f', long, global = true)]
    file: Option<PathBuf>,

    /// Order table
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Settings file
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    settings: PathBuf,

    /// JSON file mapping recipe names to picture paths, instead of prompting
    #[arg(long, global = true)]
    images: Option<PathBuf>,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: reconcile → assemble → compile (default)
    Build {
        /// Stop after writing the .tex file
        #[arg(long)]
        no_compile: bool,
    },
    /// Fill in missing pictures, fix drifted picture paths, sort and save the tables
    Reconcile,
    /// Write the .tex document from the (reconciled) recipe table
    Assemble,
    /// Report problems in the table and picture store without changing anything
    Check,
    /// Print a stock cookbook.toml with all options documented
    GenConfig,
    /// Print a stock tex/preamble.tex
    GenTemplate,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            title: self.title.clone(),
            author: self.author.clone(),
            language: self.language.clone(),
            ingredients: self.ingredients.clone(),
            steps: self.steps.clone(),
            tex: self.tex.clone(),
            database: self.database.clone(),
            order: self.config.clone(),
            output: self.file.clone(),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let default = Command::Build { no_compile: false };
    let command = cli.command.as_ref().unwrap_or(&default);
    match command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        Command::GenTemplate => {
            print!("{}", assemble::stock_preamble());
            return Ok(());
        }
        _ => {}
    }

    let book = load_settings(&cli)?;
    init_thread_pool(&book.processing);

    match command {
        Command::Build { no_compile } => {
            println!("==> Stage 1: Reconciling {}", book.paths.database.display());
            let report = run_reconcile(&book, cli.images.as_deref())?;
            if !report.is_complete() {
                return Err(format!(
                    "{} recipe(s) still without a picture: {}",
                    report.unresolved.len(),
                    report.unresolved.join(", ")
                )
                .into());
            }

            println!("==> Stage 2: Assembling {}", book.paths.tex.display());
            let stem = run_assemble(&book)?;

            if *no_compile {
                println!("==> Skipping compilation");
                return Ok(());
            }

            println!("==> Stage 3: Compiling");
            let built = compile::compile(&book.paths.tex, &stem, &book.compiler)?;
            compile::deliver(&built, &book.paths.output)?;
            output::print_compile_output(&book.paths.output, book.compiler.passes);

            println!("==> Build complete: {}", book.paths.output.display());
        }
        Command::Reconcile => {
            run_reconcile(&book, cli.images.as_deref())?;
        }
        Command::Assemble => {
            run_assemble(&book)?;
        }
        Command::Check => {
            println!("==> Checking {}", book.paths.database.display());
            let table = RecipeTable::load(&book.paths.database)?;
            let report = check::check(&PictureStore::new(&book.paths.tex), &table.recipes);
            output::print_check_output(&report);
            if !report.is_clean() {
                return Err("check found problems".into());
            }
            println!("==> Table is consistent");
        }
        Command::GenConfig | Command::GenTemplate => {}
    }

    Ok(())
}

/// Stock defaults → settings file → command-line flags, then validate.
fn load_settings(cli: &Cli) -> Result<BookConfig, config::ConfigError> {
    let book = cli.overrides().apply(config::load_config(&cli.settings)?);
    book.validate()?;
    debug!(settings = %cli.settings.display(), "configuration loaded");
    Ok(book)
}

/// Reconcile and persist the tables. Returns the report even when some
/// recipes are still unresolved; the caller decides whether that is fatal.
fn run_reconcile(
    book: &BookConfig,
    images: Option<&Path>,
) -> Result<ReconcileReport, Box<dyn std::error::Error>> {
    let mut table = RecipeTable::load(&book.paths.database)?;
    let order = OrderTable::load(&book.paths.order)?;
    if order.is_none() {
        info!(path = %book.paths.order.display(), "no order table");
    }

    let mut resolver: Box<dyn ImageResolver> = match images {
        Some(path) => Box::new(MappingResolver::load(path)?),
        None => Box::new(PromptResolver::stdio()),
    };
    let mut reconciler = Reconciler::new(
        PictureStore::new(&book.paths.tex),
        Quality::new(book.pictures.quality),
        resolver.as_mut(),
    );
    let report = reconciler.reconcile(&mut table, order.as_ref())?;
    reconcile::persist(&table, order.as_ref())?;
    output::print_reconcile_output(&report);
    Ok(report)
}

/// Assemble the document from the saved table. Returns the document stem.
fn run_assemble(book: &BookConfig) -> Result<String, Box<dyn std::error::Error>> {
    let table = RecipeTable::load(&book.paths.database)?;
    let options = AssembleOptions {
        tex_root: &book.paths.tex,
        labels: &book.labels,
        placeholders: Placeholders {
            title: book.book.title.clone(),
            author: book.book.author.clone(),
            language: book.book.language.clone(),
        },
    };
    let stem = book.document_stem();
    let summary = assemble::write_document(&table.recipes, &options, &stem)?;
    output::print_assemble_output(&summary);
    Ok(stem)
}

/// Log to stderr; `RUST_LOG` wins, otherwise `warn` (or `debug` with `-v`).
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
