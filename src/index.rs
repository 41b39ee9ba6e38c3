use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, mpsc};

use anyhow::Context;
use sha1_smol::Sha1;
use walkdir::WalkDir;

use crate::archives;
use crate::header::{self, Rule};
use crate::progress::{CancelToken, ProgressReporter};

/// Tuning knobs for the indexing stage.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub threads: usize,
    /// Streaming hash chunk size in bytes.
    pub chunk_size: usize,
    /// Header rules only apply to buffers at or below this size; larger
    /// files are hashed streaming without transformation.
    pub max_file_size: u64,
    /// Also hash archive files as raw bytes, for catalogs whose ROM names
    /// carry archive extensions.
    pub scan_raw_archives: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            threads: 4,
            chunk_size: 32 * 1024 * 1024,
            max_file_size: 256 * 1024 * 1024,
            scan_raw_archives: false,
        }
    }
}

/// A unit of indexing work: one on-disk file and its size.
#[derive(Debug, Clone)]
pub struct FileData {
    pub size: u64,
    pub path: PathBuf,
}

/// Where a digest was found. `from_archive` records whether the digest
/// belongs to an archive member rather than the file's own bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub path: PathBuf,
    pub from_archive: bool,
}

pub type HashIndex = HashMap<String, IndexedFile>;

/// Walk `input_dir` and build the digest-to-path index.
///
/// Files are dispatched largest-first to a pool of worker threads; each
/// worker folds results into its own partial map, and the partial maps are
/// merged serially in worker order once every worker has drained the queue.
pub fn build_index(
    input_dir: &Path,
    rules: &[Rule],
    options: &IndexOptions,
    cancel: &CancelToken,
) -> anyhow::Result<HashIndex> {
    let mut worklist = collect_files(input_dir)?;
    worklist.sort_by(|a, b| b.size.cmp(&a.size));

    let progress = ProgressReporter::for_indexing(worklist.len() as u64);
    let queue = Arc::new(Mutex::new(VecDeque::from(worklist)));
    let workers = options.threads.max(1);
    let (tx, rx) = mpsc::channel::<(usize, HashIndex)>();

    let mut index: HashIndex = HashMap::new();
    std::thread::scope(|scope| {
        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let progress = &progress;
            scope.spawn(move || {
                let mut local: HashIndex = HashMap::new();
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let job = queue.lock().expect("worklist lock poisoned").pop_front();
                    let Some(job) = job else { break };
                    progress.start_file(&job.path);
                    if let Err(err) = index_file(&job, rules, options, cancel, &mut local) {
                        log::warn!("skipping {}: {err}", job.path.display());
                    }
                    progress.finish_file();
                }
                let _ = tx.send((worker, local));
            });
        }
        drop(tx);

        let mut partials: Vec<(usize, HashIndex)> = rx.iter().collect();
        partials.sort_by_key(|(worker, _)| *worker);
        for (_, partial) in partials {
            for (digest, file) in partial {
                merge_entry(&mut index, digest, file);
            }
        }
    });
    progress.finish();

    if cancel.is_cancelled() {
        anyhow::bail!("indexing interrupted");
    }
    Ok(index)
}

/// Fold one digest into the map. A bare file beats an archive member for
/// the same digest; otherwise the earlier entry stays.
fn merge_entry(index: &mut HashIndex, digest: String, file: IndexedFile) {
    match index.entry(digest) {
        std::collections::hash_map::Entry::Occupied(mut occupied) => {
            if occupied.get().from_archive && !file.from_archive {
                occupied.insert(file);
            }
        }
        std::collections::hash_map::Entry::Vacant(vacant) => {
            vacant.insert(file);
        }
    }
}

fn index_file(
    job: &FileData,
    rules: &[Rule],
    options: &IndexOptions,
    cancel: &CancelToken,
    local: &mut HashIndex,
) -> anyhow::Result<()> {
    match archives::probe(&job.path) {
        Some(kind) => {
            // The index key is the archive path; member names matter only
            // for the digest itself.
            let walked = archives::for_each_member(&job.path, kind, |member, reader| {
                let digest = digest_reader(reader, member.size, rules, options, cancel)?;
                merge_entry(
                    local,
                    digest,
                    IndexedFile {
                        path: job.path.clone(),
                        from_archive: true,
                    },
                );
                Ok(())
            });
            if let Err(err) = walked {
                log::warn!("skipping archive {}: {err}", job.path.display());
            }
            // The archive file itself may be what the catalog describes.
            if options.scan_raw_archives {
                let digest = digest_path(&job.path, job.size, rules, options, cancel)?;
                merge_entry(
                    local,
                    digest,
                    IndexedFile {
                        path: job.path.clone(),
                        from_archive: false,
                    },
                );
            }
        }
        None => {
            let digest = digest_path(&job.path, job.size, rules, options, cancel)?;
            merge_entry(
                local,
                digest,
                IndexedFile {
                    path: job.path.clone(),
                    from_archive: false,
                },
            );
        }
    }
    Ok(())
}

fn digest_path(
    path: &Path,
    size: u64,
    rules: &[Rule],
    options: &IndexOptions,
    cancel: &CancelToken,
) -> anyhow::Result<String> {
    let file =
        File::open(path).with_context(|| format!("opening file for hashing: {}", path.display()))?;
    digest_reader(file, size, rules, options, cancel)
}

/// Canonical digest of one payload: header-transformed SHA-1 for buffers
/// small enough to hold in memory when rules are loaded, streaming SHA-1
/// otherwise.
pub fn digest_reader<R: Read>(
    mut reader: R,
    size: u64,
    rules: &[Rule],
    options: &IndexOptions,
    cancel: &CancelToken,
) -> anyhow::Result<String> {
    if !rules.is_empty() && size <= options.max_file_size {
        let mut data = Vec::with_capacity(size as usize);
        reader.read_to_end(&mut data)?;
        let data = header::transform(rules, data);
        let mut sha1 = Sha1::new();
        sha1.update(&data);
        return Ok(sha1.digest().to_string());
    }

    let mut sha1 = Sha1::new();
    let mut buf = vec![0u8; options.chunk_size.max(1)];
    loop {
        if cancel.is_cancelled() {
            anyhow::bail!("interrupted");
        }
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        sha1.update(&buf[..n]);
    }
    Ok(sha1.digest().to_string())
}

fn collect_files(input_dir: &Path) -> anyhow::Result<Vec<FileData>> {
    if !input_dir.is_dir() {
        anyhow::bail!("input directory not found: {}", input_dir.display());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(input_dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("skipping unreadable directory entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.metadata() {
            Ok(meta) => files.push(FileData {
                size: meta.len(),
                path: entry.into_path(),
            }),
            Err(err) => {
                log::warn!("skipping {}: {err}", entry.path().display());
            }
        }
    }
    Ok(files)
}
