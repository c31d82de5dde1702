//! `pdflatex`-backed compiler and precompiler.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::{Error, Result};

use super::{Compiler, Precompiler};

/// Lines of log tail kept when the output carries no `!` error lines.
const SUMMARY_TAIL: usize = 5;

/// Runs `pdflatex` on fragment and preamble sources.
#[derive(Debug, Clone)]
pub struct LatexToolchain {
    program: PathBuf,
}

impl LatexToolchain {
    /// Locate `pdflatex` in PATH.
    pub fn detect() -> Result<Self> {
        let program = which::which("pdflatex")
            .map_err(|_| Error::Toolchain("pdflatex not found in PATH".to_string()))?;
        tracing::debug!("using {}", program.display());
        Ok(Self { program })
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the program inside the source's directory.
    fn run(&self, source: &Path, args: &[String]) -> Result<Output> {
        let mut cmd = Command::new(&self.program);
        if let Some(dir) = source.parent() {
            cmd.current_dir(dir);
        }
        cmd.args(args);

        cmd.output().map_err(|e| {
            Error::Toolchain(format!("failed to run {}: {}", self.program.display(), e))
        })
    }
}

impl Compiler for LatexToolchain {
    fn compile(&self, source: &Path) -> Result<()> {
        let file = file_name(source);
        let output = self.run(
            source,
            &[
                "-interaction=nonstopmode".to_string(),
                "-halt-on-error".to_string(),
                file,
            ],
        )?;

        if !output.status.success() {
            return Err(Error::Compilation {
                source_file: source.to_path_buf(),
                message: error_summary(&String::from_utf8_lossy(&output.stdout)),
            });
        }
        Ok(())
    }
}

impl Precompiler for LatexToolchain {
    fn precompile(&self, preamble: &Path) -> Result<()> {
        let stem = preamble
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "preamble".to_string());

        tracing::info!("Precompiling {}", preamble.display());

        let output = self.run(
            preamble,
            &[
                "-ini".to_string(),
                "-interaction=nonstopmode".to_string(),
                "-halt-on-error".to_string(),
                format!("-jobname={}", stem),
                "&pdflatex".to_string(),
                "mylatexformat.ltx".to_string(),
                file_name(preamble),
            ],
        )?;

        if !output.status.success() {
            return Err(Error::Precompile(error_summary(&String::from_utf8_lossy(
                &output.stdout,
            ))));
        }
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Condense a TeX log into its error lines, or its tail when none are marked.
pub(crate) fn error_summary(log: &str) -> String {
    let errors: Vec<&str> = log.lines().filter(|l| l.starts_with('!')).collect();
    if !errors.is_empty() {
        return errors.join("\n");
    }

    let lines: Vec<&str> = log.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip = lines.len().saturating_sub(SUMMARY_TAIL);
    lines[skip..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_summary_prefers_bang_lines() {
        let log = "This is pdfTeX\n(./fragment.tex\n! Undefined control sequence.\nl.3 \\drwa\n! Emergency stop.\n";
        assert_eq!(
            error_summary(log),
            "! Undefined control sequence.\n! Emergency stop."
        );
    }

    #[test]
    fn test_error_summary_falls_back_to_tail() {
        let log = "a\nb\n\nc\nd\ne\nf\ng\n";
        assert_eq!(error_summary(log), "c\nd\ne\nf\ng");
    }

    #[test]
    fn test_missing_program_is_toolchain_error() {
        let toolchain = LatexToolchain::with_program("/nonexistent/texpic-pdflatex");
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("fragment.tex");

        let err = toolchain.compile(&source).unwrap_err();
        assert!(matches!(err, Error::Toolchain(_)));
    }
}
