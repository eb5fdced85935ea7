//! Filesystem helpers.

use eyre::{Result, WrapErr};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Clean a name to safely use it as a directory or file name.
///
/// Windows is the restrictive target: its reserved characters become `_`
/// and trailing dots/spaces are stripped.
/// See https://docs.microsoft.com/en-us/windows/win32/fileio/naming-a-file
pub fn sanitize_name(name: &str) -> PathBuf {
    let cleaned = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '?' | '<' | '>' | ':' | '*' | '|' | '"' => '_',
            _ => c,
        })
        .collect::<String>();

    cleaned.trim_end_matches(&['.', ' '][..]).to_owned().into()
}

/// Recursively create a directory and all of its parents if necessary.
pub fn mkdir_p(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("mkdir_p {}", path.display()))
}

/// Write a file atomically (tempfile + rename, in the same directory).
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp_path = path.to_path_buf();
    tmp_path.set_extension("part");

    fs::write(&tmp_path, data)
        .with_context(|| format!("write {}", tmp_path.display()))?;

    fs::rename(&tmp_path, path)
        .with_context(|| format!("rename to {}", path.display()))?;

    Ok(())
}
