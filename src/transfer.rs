use std::fs;
use std::path::Path;

use anyhow::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Copy,
    Move,
}

/// Copy or move one complete file into place, creating parent directories
/// on demand. Copies land under a temporary sibling name and are renamed
/// once complete, so an interrupted run never leaves a partial file at the
/// destination. Moves try a rename first and fall back to copy-then-delete
/// across filesystems.
pub fn transfer_file(source: &Path, dest: &Path, mode: TransferMode) -> anyhow::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory: {}", parent.display()))?;
    }
    match mode {
        TransferMode::Copy => copy_complete(source, dest),
        TransferMode::Move => {
            if fs::rename(source, dest).is_ok() {
                return Ok(());
            }
            copy_complete(source, dest)?;
            fs::remove_file(source)
                .with_context(|| format!("removing moved file: {}", source.display()))
        }
    }
}

fn copy_complete(source: &Path, dest: &Path) -> anyhow::Result<()> {
    let mut tmp_name = dest
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".part");
    let tmp = dest.with_file_name(tmp_name);

    fs::copy(source, &tmp).with_context(|| {
        format!(
            "copying {} to {}",
            source.display(),
            tmp.display()
        )
    })?;
    fs::rename(&tmp, dest)
        .with_context(|| format!("finalizing copy to {}", dest.display()))
}
