//! End-to-end tests for the commands that need no TeX installation.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const DOC: &str = r"\documentclass{article}
\usepackage{xcolor}
\usetikzlibrary{arrows.meta}
\begin{document}
Text.
\begin{tikzpicture}
\draw[->] (0,0) -- (1,1);
\end{tikzpicture}
\end{document}
";

fn texpic() -> Command {
    Command::cargo_bin("texpic").expect("binary should build")
}

fn document(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("figures.tex");
    fs::write(&path, DOC).unwrap();
    path
}

#[test]
fn test_preamble_prints_declarations() {
    let dir = TempDir::new().unwrap();
    let path = document(&dir);

    texpic()
        .arg("preamble")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("\\usepackage{tikz}\n\\usepackage{xcolor}\n"))
        .stdout(predicate::str::contains("\\usetikzlibrary{arrows.meta}"))
        .stdout(predicate::str::contains("\\pdfobjcompresslevel=0"))
        .stdout(predicate::str::contains("tikzpicture").not());
}

#[test]
fn test_preamble_up_to_line() {
    let dir = TempDir::new().unwrap();
    let path = document(&dir);

    texpic()
        .args(["preamble", "--up-to", "2"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("xcolor"))
        .stdout(predicate::str::contains("arrows.meta").not());
}

#[test]
fn test_preamble_with_extra_declarations() {
    let dir = TempDir::new().unwrap();
    let path = document(&dir);
    fs::write(dir.path().join("styles.tex"), "\\tikzset{hl/.style={red}}\n").unwrap();
    fs::write(
        dir.path().join("texpic.json"),
        r#"{"preambleContents": "styles.tex", "parseTeXFile": false}"#,
    )
    .unwrap();

    texpic()
        .arg("preamble")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\\tikzset{hl/.style={red}}"))
        .stdout(predicate::str::contains("xcolor").not());
}

#[test]
fn test_locate_prints_range() {
    let dir = TempDir::new().unwrap();
    let path = document(&dir);

    texpic()
        .args(["locate", "--line", "7"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#"{"start":{"line":5,"character":0},"end":{"line":7,"character":17}}"#,
        ));
}

#[test]
fn test_locate_outside_picture_fails() {
    let dir = TempDir::new().unwrap();
    let path = document(&dir);

    texpic()
        .args(["locate", "--line", "5"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No tikzpicture at line 5"));
}

#[test]
fn test_missing_document() {
    texpic()
        .args(["preamble", "/nonexistent/figures.tex"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Document not found"));
}

#[test]
fn test_bad_config_shows_hint() {
    let dir = TempDir::new().unwrap();
    let path = document(&dir);
    let config = dir.path().join("broken.json");
    fs::write(&config, r#"{"delay": "soon"}"#).unwrap();

    texpic()
        .arg("preamble")
        .arg(&path)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration error"))
        .stderr(predicate::str::contains("hint:"));
}
