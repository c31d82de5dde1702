//! Integration tests for the async preview service.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;
use texpic_core::{
    Compiler, Precompiler, PreviewConfig, PreviewService, Previewer, Range, Result,
    ViewerRegistry,
};

#[derive(Default)]
struct Counting(AtomicUsize);

impl Compiler for Counting {
    fn compile(&self, _source: &Path) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Precompiler for Counting {
    fn precompile(&self, _preamble: &Path) -> Result<()> {
        Ok(())
    }
}

const TEXT: &str = "\\documentclass{article}
\\begin{document}
\\begin{tikzpicture}
\\draw (0,0) -- (1,1);
\\end{tikzpicture}
\\end{document}
";

fn service(delay_ms: u64) -> (PreviewService, texpic_core::PreviewHandle, Arc<Counting>, Arc<ViewerRegistry>) {
    let counting = Arc::new(Counting::default());
    let viewer = Arc::new(ViewerRegistry::new());
    let config = PreviewConfig {
        delay: Duration::from_millis(delay_ms),
        ..Default::default()
    };
    let previewer = Previewer::new(config, "/", counting.clone(), counting.clone(), viewer.clone())
        .expect("Failed to create previewer");
    let (service, handle) = PreviewService::new(previewer);
    (service, handle, counting, viewer)
}

#[tokio::test]
async fn test_view_loads_document_from_disk_and_follows_replacements() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("figure.tex");
    std::fs::write(&path, TEXT).unwrap();

    let (service, handle, counting, _viewer) = service(20);
    let task = tokio::spawn(service.run());

    handle
        .view(&path, Range::from_coords(2, 0, 4, 17))
        .await
        .expect("view failed");
    assert_eq!(counting.0.load(Ordering::SeqCst), 1);

    let edited = TEXT.replace("(1,1);", "(1,1);\n\\draw (2,2) -- (3,3);");
    handle.replace(&path, edited).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    drop(handle);
    let previewer = task.await.unwrap();

    assert_eq!(counting.0.load(Ordering::SeqCst), 2);
    let session = previewer.session(&path).unwrap();
    assert_eq!(session.fragments()[0].bounds, Range::from_coords(2, 0, 5, 17));
    assert!(session.fragments()[0].content.contains("(3,3)"));
}

#[tokio::test]
async fn test_viewer_closed_releases_fragment() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("figure.tex");

    let (service, handle, _counting, viewer) = service(20);
    let task = tokio::spawn(service.run());

    handle.open(&path, TEXT).unwrap();
    let artifact = handle
        .view(&path, Range::from_coords(2, 0, 4, 17))
        .await
        .expect("view failed");
    assert!(viewer.is_open(&artifact.target));

    viewer.close(&artifact.target);
    handle.viewer_closed(&artifact.target).unwrap();
    handle.close(&path).unwrap();

    drop(handle);
    let previewer = task.await.unwrap();

    assert!(previewer.session(&path).is_none());
    assert!(previewer.fragment_cache().is_empty());
}

#[tokio::test]
async fn test_view_of_missing_file_is_io_error() {
    let (service, handle, _counting, _viewer) = service(20);
    let task = tokio::spawn(service.run());

    let err = handle
        .view("/nonexistent/texpic/figure.tex", Range::default())
        .await
        .unwrap_err();
    assert!(matches!(err, texpic_core::Error::Io(_)));

    drop(handle);
    task.await.unwrap();
}
