//! Preamble command implementation.
//!
//! Prints exactly what would be precompiled for the document's pictures.

use std::path::Path;

use texpic_core::Document;
use texpic_core::preamble::{Scope, extract};

use crate::input;

pub fn execute(file: &str, up_to: Option<u32>, config: Option<&Path>) -> anyhow::Result<()> {
    let path = input::resolve_document(file)?;
    let config = input::load_config(config, &path)?;
    let doc = input::read_document(&path)?;

    let workspace = input::workspace_of(&path);
    let scope = match up_to {
        Some(n) => Scope::UpToLine(n),
        None => Scope::Document,
    };

    let options = config.extract_options(&workspace);
    print!("{}", extract(&doc.text(), &workspace, scope, &options));
    Ok(())
}
