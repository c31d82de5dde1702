//! Render command implementation.
//!
//! Compiles one picture and copies the result out of the scratch directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use texpic_core::{LatexToolchain, Previewer, Range, ViewerRegistry, ViewerUpdate};

use crate::colors;
use crate::input;

pub fn execute(
    file: &str,
    line: u32,
    output: Option<PathBuf>,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let path = input::resolve_document(file)?;
    let config = input::load_config(config, &path)?;
    let doc = input::read_document(&path)?;
    let range = input::picture_at(&doc, line)?;
    let output = output.unwrap_or_else(|| input::default_output(&path, line));

    let toolchain = Arc::new(LatexToolchain::detect()?);
    let viewer = Arc::new(export_viewer(output.clone()));
    let mut previewer = Previewer::new(
        config,
        input::workspace_of(&path),
        toolchain.clone(),
        toolchain,
        viewer.clone(),
    )?;

    let artifact = previewer.view(&doc, range)?;
    if !viewer.is_open(&artifact.target) {
        eprintln!("{}", status_line(false, range));
        anyhow::bail!("Compilation failed (run with --verbose for details)");
    }

    println!(
        "{} in {:.2}s",
        status_line(true, range),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

/// `Rendered lines a-b` in green, or `Failed lines a-b` in red, 1-based.
fn status_line(success: bool, range: Range) -> String {
    let (color, verb) = if success {
        (colors::GREEN, "Rendered")
    } else {
        (colors::RED, "Failed")
    };
    format!(
        "{}{}{} lines {}-{}",
        color,
        verb,
        colors::RESET,
        range.start.line + 1,
        range.end.line + 1
    )
}

/// Viewer that copies every opened or refreshed target to `output`.
pub fn export_viewer(output: PathBuf) -> ViewerRegistry {
    ViewerRegistry::with_callback(move |target, update| {
        if let Err(e) = fs::copy(target, &output) {
            tracing::warn!("Failed to copy {} to {}: {}", target.display(), output.display(), e);
            return;
        }

        let verb = match update {
            ViewerUpdate::Opened { .. } => "Wrote",
            ViewerUpdate::Refreshed => "Updated",
        };
        println!("{}{}{} {}", colors::CYAN, verb, colors::RESET, output.display());
        colors::flush_stdout();
    })
}
