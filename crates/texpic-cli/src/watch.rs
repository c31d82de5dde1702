//! Watch command implementation.
//!
//! Renders a picture, then feeds every change of the document to the preview
//! service so the picture is recompiled as it is edited.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_mini::{DebounceEventResult, new_debouncer, notify::RecursiveMode};
use texpic_core::{Document, LatexToolchain, PreviewService, Previewer};
use tokio::sync::mpsc;

use crate::colors;
use crate::input;
use crate::render::export_viewer;

/// Execute the watch command.
pub async fn execute(
    file: &str,
    line: u32,
    output: Option<PathBuf>,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    let path = input::resolve_document(file)?;
    let config = input::load_config(config, &path)?;
    let doc = input::read_document(&path)?;
    let range = input::picture_at(&doc, line)?;
    let output = output.unwrap_or_else(|| input::default_output(&path, line));

    if !config.tracking_enabled() {
        println!(
            "{}Tracking is disabled (delay is 0); rendering once.{}",
            colors::YELLOW,
            colors::RESET
        );
    }

    let toolchain = Arc::new(LatexToolchain::detect()?);
    let previewer = Previewer::new(
        config,
        input::workspace_of(&path),
        toolchain.clone(),
        toolchain,
        Arc::new(export_viewer(output)),
    )?;
    let (service, handle) = PreviewService::new(previewer);
    let service = tokio::spawn(service.run());

    println!(
        "\n{}texpic watch{} - {}{}{}",
        colors::BOLD,
        colors::RESET,
        colors::CYAN,
        path.display(),
        colors::RESET
    );
    println!("{}", "─".repeat(50));

    handle.open(&path, doc.text())?;
    handle.view(&path, range).await?;

    println!(
        "{}Watching for changes... (Ctrl+C to stop){}",
        colors::DIM,
        colors::RESET
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let watched = path.clone();
    let mut debouncer = new_debouncer(
        Duration::from_millis(50),
        move |result: DebounceEventResult| {
            if let Ok(events) = result
                && events.iter().any(|e| e.path == watched)
            {
                let _ = tx.send(());
            }
        },
    )
    .map_err(|e| anyhow::anyhow!("Failed to create file watcher: {}", e))?;

    debouncer
        .watcher()
        .watch(&input::workspace_of(&path), RecursiveMode::NonRecursive)
        .map_err(|e| anyhow::anyhow!("Failed to watch {}: {}", path.display(), e))?;

    loop {
        tokio::select! {
            event = rx.recv() => {
                if event.is_none() {
                    break;
                }
                match std::fs::read_to_string(&path) {
                    Ok(text) => handle.replace(&path, text)?,
                    Err(e) => eprintln!(
                        "\n{}Warning:{} cannot read {}: {}",
                        colors::YELLOW,
                        colors::RESET,
                        path.display(),
                        e
                    ),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drop(handle);
    service.await?;
    Ok(())
}
