use std::collections::BTreeMap;

use serde::Serialize;

use crate::archives;
use crate::config::Config;
use crate::dat::{Catalog, DatRom};
use crate::regions;
use crate::scoring::Score;
use crate::title;
use crate::utils::matches_any;

/// One selection unit: a single DAT entry expanded for one of its parsed
/// regions. A game released in three regions contributes three candidates
/// to its parent's group.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub is_bad: bool,
    pub is_prerelease: bool,
    pub region: String,
    pub languages: Vec<String>,
    pub input_index: usize,
    pub revision: String,
    pub version: String,
    pub sample: String,
    pub demo: String,
    pub beta: String,
    pub proto: String,
    pub is_parent: bool,
    pub name: String,
    pub roms: Vec<DatRom>,
    pub score: Score,
}

/// Candidates grouped under their parent game key, iterated in ascending
/// key order by the selector.
pub type CandidateGroups = BTreeMap<String, Vec<Candidate>>;

/// Expand every catalog entry into per-region candidates, applying the
/// name-based exclusion filters. Entries with no parseable region and no
/// usable release record are dropped with a warning.
pub fn build_candidates(catalog: &Catalog, config: &Config) -> CandidateGroups {
    let mut groups: CandidateGroups = BTreeMap::new();

    for (input_index, game) in catalog.games.iter().enumerate() {
        let name = &game.name;
        if matches_any(name, &config.exclude) {
            log::debug!("excluded by pattern: {name}");
            continue;
        }
        if filtered_by_category(name, config) {
            log::debug!("filtered by category: {name}");
            continue;
        }

        let parsed = title::parse_title(name);

        let mut codes: Vec<String> = Vec::new();
        for code in &parsed.regions {
            if !codes.contains(code) {
                codes.push(code.clone());
            }
        }
        for release in &game.releases {
            let region = regions::find_or_register(&release.region);
            if !codes.contains(&region.code) {
                codes.push(region.code);
            }
        }
        if codes.is_empty() {
            log::warn!("no parseable region for {name}, skipping entry");
            continue;
        }

        let languages = if parsed.languages.is_empty() {
            regions::languages_for(&codes)
        } else {
            parsed.languages.clone()
        };

        let parent_name = game.clone_of.clone().unwrap_or_else(|| name.clone());
        let group = groups.entry(parent_name).or_default();
        for region in codes {
            group.push(Candidate {
                is_bad: parsed.is_bad,
                is_prerelease: parsed.is_prerelease,
                region,
                languages: languages.clone(),
                input_index,
                revision: parsed.revision.clone(),
                version: parsed.version.clone(),
                sample: parsed.sample.clone(),
                demo: parsed.demo.clone(),
                beta: parsed.beta.clone(),
                proto: parsed.proto.clone(),
                is_parent: game.clone_of.is_none(),
                name: name.clone(),
                roms: game.roms.clone(),
                score: Score::default(),
            });
        }
    }

    groups
}

fn filtered_by_category(name: &str, config: &Config) -> bool {
    (config.no_bios && title::is_bios(name))
        || (config.no_program && title::is_program(name))
        || (config.no_enhancement_chip && title::is_enhancement_chip(name))
        || (config.no_proto && title::is_proto(name))
        || (config.no_beta && title::is_beta(name))
        || (config.no_demo && title::is_demo(name))
        || (config.no_sample && title::is_sample(name))
        || (config.no_pirate && title::is_pirate(name))
        || (config.no_promo && title::is_promo(name))
        || (config.no_unlicensed && title::is_unlicensed(name))
}

/// Scanning trusts the catalog's declared digests; a game without them
/// cannot be matched and aborts the run before any hashing starts.
pub fn ensure_checksums(groups: &CandidateGroups) -> anyhow::Result<()> {
    for candidates in groups.values() {
        for candidate in candidates {
            for rom in &candidate.roms {
                if rom.sha1.is_none() {
                    anyhow::bail!(
                        "catalog declares no SHA-1 digest for {} ({}); \
                         file scanning needs one per ROM",
                        candidate.name,
                        rom.name
                    );
                }
            }
        }
    }
    Ok(())
}

/// Whether any declared ROM name carries an archive extension, meaning
/// archive files themselves may be stored raw in the input directory.
pub fn dat_references_archives(catalog: &Catalog) -> bool {
    catalog
        .games
        .iter()
        .flat_map(|game| game.roms.iter())
        .any(|rom| archives::has_archive_suffix(&rom.name))
}
