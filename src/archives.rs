use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;
use zip::read::ZipArchive;

/// Supported container formats. ZIP and TAR are read natively; 7z and RAR
/// go through the system binary when one is on PATH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    SevenZ,
    Rar,
}

impl ArchiveKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::Tar => "tar",
            ArchiveKind::SevenZ => "7z",
            ArchiveKind::Rar => "rar",
        }
    }
}

/// A non-directory archive member: its path inside the container and its
/// uncompressed size.
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    pub name: String,
    pub size: u64,
}

static SEVENZ_BIN: Lazy<Option<PathBuf>> =
    Lazy::new(|| which::which("7z").or_else(|_| which::which("7za")).ok());
static UNRAR_BIN: Lazy<Option<PathBuf>> = Lazy::new(|| which::which("unrar").ok());

static ARCHIVE_SUFFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(zip|tar|7z|rar)$").unwrap());

/// True when a catalog ROM name ends in an archive extension, i.e. the dump
/// itself is expected to be an archive file stored raw on disk.
pub fn has_archive_suffix(name: &str) -> bool {
    ARCHIVE_SUFFIX_REGEX.is_match(name)
}

/// Warn once at startup about formats that will be skipped for lack of a
/// system binary. Never fatal.
pub fn log_support_warnings() {
    if SEVENZ_BIN.is_none() {
        log::warn!("no 7z binary on PATH, 7z archives will be skipped");
    }
    if UNRAR_BIN.is_none() {
        log::warn!("no unrar binary on PATH, RAR archives will be skipped");
    }
}

/// Sniff a file's archive format from its magic bytes. Pure classification:
/// unreadable files and unknown formats both come back as `None`.
pub fn probe(path: &Path) -> Option<ArchiveKind> {
    let mut file = File::open(path).ok()?;
    let mut magic = [0u8; 8];
    let n = file.read(&mut magic).ok()?;

    if n >= 4 && magic[..2] == *b"PK" && matches!((magic[2], magic[3]), (3, 4) | (5, 6) | (7, 8)) {
        return Some(ArchiveKind::Zip);
    }
    if n >= 6 && magic[..6] == *b"7z\xBC\xAF\x27\x1C" {
        return Some(ArchiveKind::SevenZ);
    }
    if n >= 6 && magic[..6] == *b"Rar!\x1A\x07" {
        return Some(ArchiveKind::Rar);
    }

    // ustar magic sits at offset 257 in the header block
    if file.seek(SeekFrom::Start(257)).is_ok() {
        let mut ustar = [0u8; 5];
        if let Ok(n) = file.read(&mut ustar) {
            if n == 5 && ustar == *b"ustar" {
                return Some(ArchiveKind::Tar);
            }
        }
    }

    None
}

/// Iterate the non-directory members of an archive, handing each to `visit`
/// as a readable stream over the decompressed payload.
///
/// Failing to open the archive itself is an error; a member that cannot be
/// read is logged and skipped without aborting the remaining members.
pub fn for_each_member<F>(path: &Path, kind: ArchiveKind, visit: F) -> anyhow::Result<()>
where
    F: FnMut(&ArchiveMember, &mut dyn Read) -> anyhow::Result<()>,
{
    match kind {
        ArchiveKind::Zip => zip_members(path, visit),
        ArchiveKind::Tar => tar_members(path, visit),
        ArchiveKind::SevenZ => {
            let binary = SEVENZ_BIN
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("no 7z binary on PATH"))?;
            extracted_members(path, visit, |tmp| {
                let mut cmd = Command::new(binary);
                cmd.arg("x")
                    .arg(path.as_os_str())
                    .arg(format!("-o{}", tmp.display()))
                    .arg("-y");
                cmd
            })
        }
        ArchiveKind::Rar => {
            let binary = UNRAR_BIN
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("no unrar binary on PATH"))?;
            extracted_members(path, visit, |tmp| {
                let mut cmd = Command::new(binary);
                cmd.arg("x")
                    .arg("-y")
                    .arg(path.as_os_str())
                    .arg(format!("{}/", tmp.display()));
                cmd
            })
        }
    }
}

fn zip_members<F>(path: &Path, mut visit: F) -> anyhow::Result<()>
where
    F: FnMut(&ArchiveMember, &mut dyn Read) -> anyhow::Result<()>,
{
    let file = File::open(path).with_context(|| format!("opening archive: {}", path.display()))?;
    let mut zip =
        ZipArchive::new(file).with_context(|| format!("reading archive: {}", path.display()))?;
    for i in 0..zip.len() {
        let mut entry = match zip.by_index(i) {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("skipping member {i} of {}: {err}", path.display());
                continue;
            }
        };
        if !entry.is_file() {
            continue;
        }
        let member = ArchiveMember {
            name: entry.name().to_string(),
            size: entry.size(),
        };
        if let Err(err) = visit(&member, &mut entry) {
            log::warn!("failed to read {} from {}: {err}", member.name, path.display());
        }
    }
    Ok(())
}

fn tar_members<F>(path: &Path, mut visit: F) -> anyhow::Result<()>
where
    F: FnMut(&ArchiveMember, &mut dyn Read) -> anyhow::Result<()>,
{
    let file = File::open(path).with_context(|| format!("opening archive: {}", path.display()))?;
    let mut archive = tar::Archive::new(file);
    let entries = archive
        .entries()
        .with_context(|| format!("reading archive: {}", path.display()))?;
    for entry in entries {
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("skipping unreadable member of {}: {err}", path.display());
                continue;
            }
        };
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        let member = ArchiveMember {
            name,
            size: entry.size(),
        };
        if let Err(err) = visit(&member, &mut entry) {
            log::warn!("failed to read {} from {}: {err}", member.name, path.display());
        }
    }
    Ok(())
}

/// Shared strategy for formats without a native reader: extract the whole
/// archive into a temporary directory with the system binary, then walk the
/// extracted tree.
fn extracted_members<F, C>(path: &Path, mut visit: F, command: C) -> anyhow::Result<()>
where
    F: FnMut(&ArchiveMember, &mut dyn Read) -> anyhow::Result<()>,
    C: FnOnce(&Path) -> Command,
{
    let tmp = tempfile::tempdir().context("creating extraction directory")?;
    let status = command(tmp.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .with_context(|| format!("extracting archive: {}", path.display()))?;
    if !status.success() {
        anyhow::bail!("extraction failed for {}", path.display());
    }

    for entry in WalkDir::new(tmp.path())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let rel = entry
            .path()
            .strip_prefix(tmp.path())
            .unwrap_or(entry.path());
        let member = ArchiveMember {
            name: rel.to_string_lossy().replace('\\', "/"),
            size: entry.metadata().map(|m| m.len()).unwrap_or(0),
        };
        match File::open(entry.path()) {
            Ok(mut file) => {
                if let Err(err) = visit(&member, &mut file) {
                    log::warn!("failed to read {} from {}: {err}", member.name, path.display());
                }
            }
            Err(err) => {
                log::warn!("failed to open extracted member {}: {err}", member.name);
            }
        }
    }
    Ok(())
}
