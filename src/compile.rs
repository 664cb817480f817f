//! Running the LaTeX compiler and delivering the PDF.
//!
//! The compiler runs inside the tex root so relative picture references and
//! auxiliary files resolve there. It runs `passes` times: the first pass
//! writes the table of contents, the second picks it up.

use crate::config::CompilerConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

/// Lines of compiler output kept in [`CompileError::Failed`].
const OUTPUT_TAIL_LINES: usize = 20;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` failed on pass {pass} ({status}):\n{output}")]
    Failed {
        program: String,
        pass: u32,
        status: String,
        output: String,
    },
    #[error("compiler finished but {0} was not produced")]
    MissingOutput(PathBuf),
}

/// Compile `<tex_root>/<stem>.tex` and return the path of the built PDF.
pub fn compile(tex_root: &Path, stem: &str, config: &CompilerConfig) -> Result<PathBuf, CompileError> {
    let tex_file = format!("{stem}.tex");
    for pass in 1..=config.passes {
        debug!(program = %config.program, pass, "running compiler");
        let output = Command::new(&config.program)
            .args(&config.args)
            .arg(&tex_file)
            .current_dir(tex_root)
            .output()
            .map_err(|source| CompileError::Spawn {
                program: config.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(CompileError::Failed {
                program: config.program.clone(),
                pass,
                status: output.status.to_string(),
                output: tail(&combined, OUTPUT_TAIL_LINES),
            });
        }
    }

    let pdf = tex_root.join(format!("{stem}.pdf"));
    if !pdf.is_file() {
        return Err(CompileError::MissingOutput(pdf));
    }
    info!(pdf = %pdf.display(), passes = config.passes, "compiled");
    Ok(pdf)
}

/// Move the built PDF to its destination, copying across filesystems.
pub fn deliver(built: &Path, destination: &Path) -> Result<(), CompileError> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(built, destination).is_err() {
        fs::copy(built, destination)?;
        fs::remove_file(built)?;
    }
    info!(to = %destination.display(), "delivered PDF");
    Ok(())
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn shell(script: &str, passes: u32) -> CompilerConfig {
        CompilerConfig {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            passes,
        }
    }

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
        assert_eq!(tail("", 5), "");
    }

    #[cfg(unix)]
    #[test]
    fn compile_runs_every_pass_in_tex_root() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Book.tex"), "x").unwrap();
        // $0 is the .tex file name appended after the script.
        let config = shell(r#"echo pass >> passes.log; cp "$0" "${0%.tex}.pdf""#, 2);

        let pdf = compile(tmp.path(), "Book", &config).unwrap();

        assert_eq!(pdf, tmp.path().join("Book.pdf"));
        let log = fs::read_to_string(tmp.path().join("passes.log")).unwrap();
        assert_eq!(log.lines().count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_failed_with_output() {
        let tmp = TempDir::new().unwrap();
        let config = shell("echo '! Undefined control sequence.'; exit 1", 2);

        match compile(tmp.path(), "Book", &config).unwrap_err() {
            CompileError::Failed { pass, output, .. } => {
                assert_eq!(pass, 1);
                assert!(output.contains("Undefined control sequence"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn success_without_pdf_is_missing_output() {
        let tmp = TempDir::new().unwrap();
        let err = compile(tmp.path(), "Book", &shell("true", 1)).unwrap_err();
        assert!(matches!(err, CompileError::MissingOutput(_)));
    }

    #[test]
    fn unknown_program_is_spawn_error() {
        let tmp = TempDir::new().unwrap();
        let config = CompilerConfig {
            program: "definitely-not-a-latex-compiler".into(),
            args: vec![],
            passes: 1,
        };
        let err = compile(tmp.path(), "Book", &config).unwrap_err();
        assert!(matches!(err, CompileError::Spawn { .. }));
    }

    #[test]
    fn deliver_moves_pdf() {
        let tmp = TempDir::new().unwrap();
        let built = tmp.path().join("tex/Book.pdf");
        fs::create_dir_all(built.parent().unwrap()).unwrap();
        fs::write(&built, b"%PDF").unwrap();
        let dest = tmp.path().join("out/Book.pdf");

        deliver(&built, &dest).unwrap();

        assert!(!built.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"%PDF");
    }
}
