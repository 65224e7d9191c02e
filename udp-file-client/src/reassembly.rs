//! Turning a finished [`Collection`] back into a file.
//!
//! Parts arrive in whatever order the network delivered them.  This module
//! puts them back in index order, refuses to produce a file with holes in
//! it, and writes the result under an output directory.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::collector::Collection;

#[derive(Debug, Error)]
pub enum ReassemblyError {
    /// These part indices never arrived.
    #[error("missing parts: {0:?}")]
    Missing(Vec<u32>),
    /// The requested name has no usable file component.
    #[error("invalid file name {0:?}")]
    InvalidName(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Concatenate parts `0..expected` in index order.
///
/// Parts with an index outside the announced range are ignored.
pub fn reassemble(collection: &Collection) -> Result<Vec<u8>, ReassemblyError> {
    let missing = collection.missing();
    if !missing.is_empty() {
        return Err(ReassemblyError::Missing(missing));
    }

    let mut ordered: Vec<_> = collection
        .parts
        .iter()
        .filter(|p| (p.part as usize) < collection.expected)
        .collect();
    if ordered.len() < collection.parts.len() {
        log::warn!(
            "ignoring {} part(s) outside 0..{}",
            collection.parts.len() - ordered.len(),
            collection.expected
        );
    }
    ordered.sort_by_key(|p| p.part);

    let total = ordered.iter().map(|p| p.content.len()).sum();
    let mut bytes = Vec::with_capacity(total);
    for part in ordered {
        bytes.extend_from_slice(&part.content);
    }
    Ok(bytes)
}

/// Write `bytes` as `dir/<name>`, creating `dir` if needed.
///
/// Only the last component of `name` is used, so a server-chosen name can
/// not escape `dir`.
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, ReassemblyError> {
    let file_name = Path::new(name)
        .file_name()
        .ok_or_else(|| ReassemblyError::InvalidName(name.to_string()))?;

    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, bytes)?;
    log::info!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(path)
}
