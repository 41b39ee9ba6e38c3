use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use regex::Regex;
use serde::Serialize;

use crate::cli::Cli;
use crate::regions;
use crate::utils::is_valid;

const FILE_PREFIX: &str = "file:";

/// Validated run configuration. Sizes are in bytes (the CLI takes MiB),
/// pattern lists are compiled, and `--no-all` has been folded into the
/// individual filter flags.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub dat: PathBuf,
    pub regions: Vec<String>,
    pub languages: Vec<String>,
    pub language_weight: u32,
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub extension: Option<String>,
    pub no_scan: bool,
    pub move_files: bool,
    pub threads: usize,
    pub chunk_size: usize,
    pub max_file_size: u64,
    pub header_file: Option<PathBuf>,
    pub no_bios: bool,
    pub no_program: bool,
    pub no_enhancement_chip: bool,
    pub no_proto: bool,
    pub no_beta: bool,
    pub no_demo: bool,
    pub no_sample: bool,
    pub no_pirate: bool,
    pub no_promo: bool,
    pub no_unlicensed: bool,
    pub all_regions: bool,
    pub all_regions_with_lang: bool,
    pub only_selected_lang: bool,
    pub early_revisions: bool,
    pub early_versions: bool,
    pub input_order: bool,
    pub prefer_parents: bool,
    pub prefer_prereleases: bool,
    pub prioritize_languages: bool,
    #[serde(skip)]
    pub prefer: Vec<Regex>,
    #[serde(skip)]
    pub avoid: Vec<Regex>,
    #[serde(skip)]
    pub exclude: Vec<Regex>,
    #[serde(skip)]
    pub exclude_after: Vec<Regex>,
    pub log_file: PathBuf,
    pub debug: bool,
    pub report: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dat: PathBuf::new(),
            regions: Vec::new(),
            languages: Vec::new(),
            language_weight: 3,
            input_dir: None,
            output_dir: None,
            extension: None,
            no_scan: false,
            move_files: false,
            threads: 4,
            chunk_size: 32 * 1024 * 1024,
            max_file_size: 256 * 1024 * 1024,
            header_file: None,
            no_bios: false,
            no_program: false,
            no_enhancement_chip: false,
            no_proto: false,
            no_beta: false,
            no_demo: false,
            no_sample: false,
            no_pirate: false,
            no_promo: false,
            no_unlicensed: false,
            all_regions: false,
            all_regions_with_lang: false,
            only_selected_lang: false,
            early_revisions: false,
            early_versions: false,
            input_order: false,
            prefer_parents: false,
            prefer_prereleases: false,
            prioritize_languages: false,
            prefer: Vec::new(),
            avoid: Vec::new(),
            exclude: Vec::new(),
            exclude_after: Vec::new(),
            log_file: PathBuf::from("rompick.log"),
            debug: false,
            report: None,
        }
    }
}

impl Config {
    /// Hash-index matching is on when an input directory is given and name
    /// matching was not requested instead.
    pub fn scan_enabled(&self) -> bool {
        self.input_dir.is_some() && !self.no_scan
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.regions.is_empty() {
            anyhow::bail!("at least one region must be selected");
        }
        if self.threads == 0 {
            anyhow::bail!("--threads must be a positive integer");
        }
        if self.language_weight == 0 {
            anyhow::bail!("--language-weight must be a positive integer");
        }
        if self.chunk_size == 0 {
            anyhow::bail!("--chunk-size must be a positive integer");
        }
        if self.max_file_size == 0 {
            anyhow::bail!("--max-file-size must be a positive integer");
        }
        if self.move_files && self.output_dir.is_none() {
            anyhow::bail!("--move requires --output-dir");
        }
        if self.output_dir.is_some() && self.input_dir.is_none() {
            anyhow::bail!("--output-dir requires --input-dir");
        }
        if self.no_scan && self.input_dir.is_none() {
            anyhow::bail!("--no-scan only makes sense together with --input-dir");
        }
        if self.extension.is_some() && self.scan_enabled() {
            anyhow::bail!("--extension only applies to name matching (--no-scan)");
        }
        if (self.all_regions_with_lang || self.only_selected_lang) && self.languages.is_empty() {
            anyhow::bail!("language-based selection requires --languages");
        }
        Ok(())
    }
}

impl TryFrom<Cli> for Config {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> anyhow::Result<Self> {
        let regions = cli
            .regions
            .iter()
            .map(|r| normalize_region(r))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let languages = cli
            .languages
            .iter()
            .map(|l| normalize_language(l))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let config = Config {
            dat: cli.dat,
            regions,
            languages,
            language_weight: cli.language_weight,
            input_dir: cli.input_dir,
            output_dir: cli.output_dir,
            extension: cli.extension.map(|e| e.trim_start_matches('.').to_string()),
            no_scan: cli.no_scan,
            move_files: cli.move_files,
            threads: cli.threads,
            chunk_size: (cli.chunk_size as usize).saturating_mul(1024 * 1024),
            max_file_size: cli.max_file_size.saturating_mul(1024 * 1024),
            header_file: cli.header_file,
            no_bios: cli.no_bios || cli.no_all,
            no_program: cli.no_program || cli.no_all,
            no_enhancement_chip: cli.no_enhancement_chip || cli.no_all,
            no_proto: cli.no_proto || cli.no_all,
            no_beta: cli.no_beta || cli.no_all,
            no_demo: cli.no_demo || cli.no_all,
            no_sample: cli.no_sample || cli.no_all,
            no_pirate: cli.no_pirate || cli.no_all,
            no_promo: cli.no_promo || cli.no_all,
            no_unlicensed: cli.no_unlicensed,
            all_regions: cli.all_regions,
            all_regions_with_lang: cli.all_regions_with_lang,
            only_selected_lang: cli.only_selected_lang,
            early_revisions: cli.early_revisions,
            early_versions: cli.early_versions,
            input_order: cli.input_order,
            prefer_parents: cli.prefer_parents,
            prefer_prereleases: cli.prefer_prereleases,
            prioritize_languages: cli.prioritize_languages,
            prefer: compile_patterns(&cli.prefer, cli.ignore_case, cli.regex)?,
            avoid: compile_patterns(&cli.avoid, cli.ignore_case, cli.regex)?,
            exclude: compile_patterns(&cli.exclude, cli.ignore_case, cli.regex)?,
            exclude_after: compile_patterns(&cli.exclude_after, cli.ignore_case, cli.regex)?,
            log_file: cli.log_file,
            debug: cli.debug,
            report: cli.report,
        };
        config.validate()?;
        Ok(config)
    }
}

fn normalize_region(arg: &str) -> anyhow::Result<String> {
    let code = arg.trim().to_uppercase();
    if code.len() != 3 {
        anyhow::bail!("'{arg}' is not a valid region code");
    }
    if !regions::is_known(&code) {
        log::warn!("'{code}' is likely not a recognized region");
    }
    Ok(code)
}

fn normalize_language(arg: &str) -> anyhow::Result<String> {
    let code = arg.trim().to_lowercase();
    if code.len() != 2 {
        anyhow::bail!("'{arg}' is not a valid language code");
    }
    Ok(code)
}

/// Each CLI value is either an inline comma-separated token list or a
/// `file:<path>` reference read one pattern per line, blank lines skipped.
/// Tokens are matched as substrings unless `--regex` is set.
fn compile_patterns(
    values: &[String],
    ignore_case: bool,
    use_regex: bool,
) -> anyhow::Result<Vec<Regex>> {
    let mut patterns = Vec::new();
    for value in values {
        for token in pattern_tokens(value)? {
            patterns.push(build_pattern(&token, ignore_case, use_regex)?);
        }
    }
    Ok(patterns)
}

fn pattern_tokens(value: &str) -> anyhow::Result<Vec<String>> {
    if let Some(path) = value.strip_prefix(FILE_PREFIX) {
        let text = fs::read_to_string(path.trim())
            .with_context(|| format!("unable to read pattern file: {path}"))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| is_valid(line))
            .map(String::from)
            .collect())
    } else {
        Ok(value
            .split(',')
            .map(str::trim)
            .filter(|token| is_valid(token))
            .map(String::from)
            .collect())
    }
}

fn build_pattern(token: &str, ignore_case: bool, use_regex: bool) -> anyhow::Result<Regex> {
    let body = if use_regex {
        token.to_string()
    } else {
        regex::escape(token)
    };
    let pattern = if ignore_case {
        format!("(?i){body}")
    } else {
        body
    };
    Regex::new(&pattern).with_context(|| format!("invalid pattern: {token}"))
}
