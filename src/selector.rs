use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::archives;
use crate::candidates::{self, Candidate, CandidateGroups};
use crate::config::Config;
use crate::dat::{self, Catalog};
use crate::header::{self, Rule};
use crate::index::{self, HashIndex, IndexOptions};
use crate::progress::CancelToken;
use crate::scoring;
use crate::transfer::{self, TransferMode};
use crate::utils::matches_any;

/// One resolved file of a selected candidate.
#[derive(Debug, Clone, Serialize)]
pub struct SelectedFile {
    pub source: PathBuf,
    pub rom_name: String,
    /// The source file is an archive container holding the payload.
    pub is_archive: bool,
}

/// The winning candidate of one parent group.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub parent: String,
    pub game: String,
    pub files: Vec<SelectedFile>,
}

#[derive(Serialize)]
struct RunReport<'a> {
    config: &'a Config,
    selections: &'a [Selection],
}

/// Full driver: parse the catalog, expand and score candidates, index the
/// input directory when scanning, then emit or transfer the winners.
pub fn run(config: &Config) -> anyhow::Result<()> {
    archives::log_support_warnings();

    let catalog = dat::parse_dat(&config.dat)?;
    if !catalog.has_clone_relations() && !confirm_standard_dat()? {
        eprintln!("Aborted.");
        return Ok(());
    }

    let mut groups = candidates::build_candidates(&catalog, config);
    if config.scan_enabled() {
        candidates::ensure_checksums(&groups)?;
    }

    let index = match &config.input_dir {
        Some(input_dir) if config.scan_enabled() => {
            let rules = load_rules(config, &catalog)?;
            let options = IndexOptions {
                threads: config.threads,
                chunk_size: config.chunk_size,
                max_file_size: config.max_file_size,
                scan_raw_archives: candidates::dat_references_archives(&catalog),
            };
            Some(index::build_index(
                input_dir,
                &rules,
                &options,
                &CancelToken::new(),
            )?)
        }
        _ => None,
    };

    let selections = select(&mut groups, index.as_ref(), config);
    emit(&selections, config)
}

/// Walk the parent groups in ascending key order and pick the first
/// ordered candidate whose files resolve.
pub fn select(
    groups: &mut CandidateGroups,
    index: Option<&HashIndex>,
    config: &Config,
) -> Vec<Selection> {
    let mut selections = Vec::new();

    for (parent, entries) in groups.iter_mut() {
        scoring::pad_and_score(entries, config);
        let mut ordered = scoring::filter_group(entries.clone(), config);
        scoring::order_group(&mut ordered, config);

        if ordered.is_empty() {
            log::warn!("no eligible candidates for {parent}");
            continue;
        }
        if matches_any(&ordered[0].name, &config.exclude_after) {
            log::debug!("skipping {parent}: best candidate matches an exclude-after pattern");
            continue;
        }

        let mut chosen = None;
        for candidate in &ordered {
            match resolve(candidate, index, config) {
                Some(files) => {
                    chosen = Some(Selection {
                        parent: parent.clone(),
                        game: candidate.name.clone(),
                        files,
                    });
                    break;
                }
                None => {
                    log::warn!(
                        "files for {} not found, trying the next candidate",
                        candidate.name
                    );
                }
            }
        }

        match chosen {
            Some(selection) => selections.push(selection),
            None => log::warn!("no eligible candidates for {parent}"),
        }
    }

    selections
}

/// Locate a candidate's files: all-or-nothing through the hash index when
/// one was built, by conventional file name otherwise. With no input
/// directory at all the candidate is accepted as a bare listing.
fn resolve(
    candidate: &Candidate,
    index: Option<&HashIndex>,
    config: &Config,
) -> Option<Vec<SelectedFile>> {
    if let Some(index) = index {
        let mut files = Vec::new();
        for rom in &candidate.roms {
            let found = rom.sha1.as_deref().and_then(|digest| index.get(digest))?;
            files.push(SelectedFile {
                source: found.path.clone(),
                rom_name: rom.name.clone(),
                is_archive: found.from_archive,
            });
        }
        return Some(files);
    }

    let Some(input_dir) = &config.input_dir else {
        return Some(Vec::new());
    };

    if let Some(extension) = &config.extension {
        let with_ext = input_dir.join(format!("{}.{}", candidate.name, extension));
        if with_ext.is_file() {
            return Some(vec![named_file(with_ext)]);
        }
    }
    let bare = input_dir.join(&candidate.name);
    if bare.is_file() {
        return Some(vec![named_file(bare)]);
    }
    if bare.is_dir() {
        let mut files = Vec::new();
        for rom in &candidate.roms {
            let path = bare.join(&rom.name);
            if !path.is_file() {
                return None;
            }
            files.push(SelectedFile {
                source: path,
                rom_name: rom.name.clone(),
                is_archive: false,
            });
        }
        return Some(files);
    }
    None
}

fn named_file(path: PathBuf) -> SelectedFile {
    let is_archive = archives::probe(&path).is_some();
    let rom_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    SelectedFile {
        source: path,
        rom_name,
        is_archive,
    }
}

fn emit(selections: &[Selection], config: &Config) -> anyhow::Result<()> {
    if let Some(output_dir) = &config.output_dir {
        let mode = if config.move_files {
            TransferMode::Move
        } else {
            TransferMode::Copy
        };
        for selection in selections {
            if let Err(err) =
                place_selection(selection, output_dir, mode, config.input_dir.as_deref())
            {
                log::warn!("failed to transfer {}: {err}", selection.game);
            }
        }
    } else {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for selection in selections {
            writeln!(out, "{}", selection.game)?;
        }
    }

    if let Some(report) = &config.report {
        let file = File::create(report)
            .with_context(|| format!("unable to create report file: {}", report.display()))?;
        serde_json::to_writer_pretty(file, &RunReport { config, selections })
            .context("writing selection report")?;
    }
    Ok(())
}

/// Destination layout under the output directory:
/// - archives keep their format, named after the selected game;
/// - multi-ROM games and nested sources group under a game directory;
/// - a single flat ROM lands directly in the output root.
fn place_selection(
    selection: &Selection,
    output_dir: &Path,
    mode: TransferMode,
    input_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let multi = selection.files.len() > 1;
    let mut done: HashSet<PathBuf> = HashSet::new();

    for file in &selection.files {
        let dest = if file.is_archive {
            let extension = archives::probe(&file.source)
                .map(|kind| kind.extension())
                .unwrap_or("zip");
            output_dir.join(format!("{}.{}", selection.game, extension))
        } else {
            let nested_source = input_dir
                .and_then(|dir| pathdiff::diff_paths(&file.source, dir))
                .map(|rel| rel.components().count() > 1)
                .unwrap_or(false);
            let nested_name = Path::new(&file.rom_name).components().count() > 1;
            if multi || nested_source || nested_name {
                output_dir.join(&selection.game).join(&file.rom_name)
            } else {
                output_dir.join(&file.rom_name)
            }
        };
        // one archive may carry several ROMs; transfer it once
        if done.insert(dest.clone()) {
            transfer::transfer_file(&file.source, &dest, mode)?;
        }
    }
    Ok(())
}

fn load_rules(config: &Config, catalog: &Catalog) -> anyhow::Result<Vec<Rule>> {
    if let Some(path) = &config.header_file {
        return header::parse_detector(path);
    }
    if let Some(name) = &catalog.header.detector {
        let sibling = config
            .dat
            .parent()
            .map(|dir| dir.join(name))
            .filter(|path| path.is_file());
        match sibling {
            Some(path) => return header::parse_detector(&path),
            None => log::warn!(
                "catalog references detector {name} but it was not found next to the DAT"
            ),
        }
    }
    Ok(Vec::new())
}

/// A DAT with no clone information selects one "best" dump per entry
/// rather than per family, which is rarely what the user wants.
fn confirm_standard_dat() -> anyhow::Result<bool> {
    eprintln!("WARNING: this DAT has no clone information and looks like a Standard DAT.");
    eprint!("Continue anyway? (y/n) ");
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("reading confirmation")?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
