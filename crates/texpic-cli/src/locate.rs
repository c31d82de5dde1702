//! Locate command implementation.

use crate::input;

/// Print the zero-based range of the picture at `line` as JSON.
pub fn execute(file: &str, line: u32) -> anyhow::Result<()> {
    let path = input::resolve_document(file)?;
    let doc = input::read_document(&path)?;
    let range = input::picture_at(&doc, line)?;

    println!("{}", serde_json::to_string(&range)?);
    Ok(())
}
