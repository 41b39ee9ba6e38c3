use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rompick",
    version,
    about = "Build 1G1R ROM sets from parent/clone DAT files",
    long_about = "Selects the single best dump per game family according to region and \
language preferences, optionally matching files on disk by canonical SHA-1 and \
copying or moving the winners into an output directory."
)]
pub struct Cli {
    // Input/output files and folders
    /// The input DAT file
    #[arg(short = 'd', long = "dat", value_name = "INPUT_DAT")]
    pub dat: PathBuf,

    /// Directory of ROM files to scan or match by name
    #[arg(short = 'i', long = "input-dir", value_name = "PATH")]
    pub input_dir: Option<PathBuf>,

    /// Where selected files are copied or moved; omit to only list the selection
    #[arg(short = 'o', long = "output-dir", value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Move files instead of copying
    #[arg(long = "move")]
    pub move_files: bool,

    // ROM selection
    /// Region codes from most preferred to least preferred
    #[arg(
        short = 'r',
        long = "regions",
        value_name = "REGION",
        value_delimiter = ',',
        required = true
    )]
    pub regions: Vec<String>,

    /// Language codes from most preferred to least preferred
    #[arg(
        short = 'l',
        long = "languages",
        value_name = "LANGUAGE",
        value_delimiter = ','
    )]
    pub languages: Vec<String>,

    /// Weight applied to matched languages when scoring
    #[arg(long = "language-weight", value_name = "WEIGHT", default_value_t = 3)]
    pub language_weight: u32,

    // File scanning
    /// Match files by name instead of hashing the input directory
    #[arg(long = "no-scan")]
    pub no_scan: bool,

    /// Number of I/O threads used to hash files
    #[arg(short = 't', long = "threads", value_name = "NUM", default_value_t = 4)]
    pub threads: usize,

    /// Streaming hash chunk size in MiB
    #[arg(long = "chunk-size", value_name = "MIB", default_value_t = 32)]
    pub chunk_size: u64,

    /// Largest file size eligible for header rules, in MiB
    #[arg(long = "max-file-size", value_name = "MIB", default_value_t = 256)]
    pub max_file_size: u64,

    /// XML header detector applied before hashing
    #[arg(long = "header-file", value_name = "PATH")]
    pub header_file: Option<PathBuf>,

    /// When matching ROMs by name, search for files using this extension
    #[arg(short = 'e', long = "extension", value_name = "EXT")]
    pub extension: Option<String>,

    // Filtering
    /// Filter out BIOSes
    #[arg(long = "no-bios")]
    pub no_bios: bool,

    /// Filter out Programs and Test Programs
    #[arg(long = "no-program")]
    pub no_program: bool,

    /// Filter out Enhancement Chips
    #[arg(long = "no-enhancement-chip")]
    pub no_enhancement_chip: bool,

    /// Filter out prototype ROMs
    #[arg(long = "no-proto")]
    pub no_proto: bool,

    /// Filter out beta ROMs
    #[arg(long = "no-beta")]
    pub no_beta: bool,

    /// Filter out demo ROMs
    #[arg(long = "no-demo")]
    pub no_demo: bool,

    /// Filter out sample ROMs
    #[arg(long = "no-sample")]
    pub no_sample: bool,

    /// Filter out pirate ROMs
    #[arg(long = "no-pirate")]
    pub no_pirate: bool,

    /// Filter out promotion ROMs
    #[arg(long = "no-promo")]
    pub no_promo: bool,

    /// Apply all filters above
    #[arg(long = "no-all")]
    pub no_all: bool,

    /// Filter out unlicensed ROMs
    #[arg(long = "no-unlicensed")]
    pub no_unlicensed: bool,

    /// Include files of unselected regions as a last resort
    #[arg(long = "all-regions")]
    pub all_regions: bool,

    /// Same as --all-regions, but only when the ROM has a selected language
    #[arg(long = "all-regions-with-lang")]
    pub all_regions_with_lang: bool,

    /// Filter out ROMs without any selected language
    #[arg(long = "only-selected-lang")]
    pub only_selected_lang: bool,

    // Adjustment and customization
    /// ROMs matching these words will be preferred
    #[arg(long = "prefer", value_name = "WORDS", action = ArgAction::Append)]
    pub prefer: Vec<String>,

    /// ROMs matching these words will be avoided (but not excluded)
    #[arg(long = "avoid", value_name = "WORDS", action = ArgAction::Append)]
    pub avoid: Vec<String>,

    /// ROMs matching these words will be excluded
    #[arg(long = "exclude", value_name = "WORDS", action = ArgAction::Append)]
    pub exclude: Vec<String>,

    /// If the best candidate matches these words, skip the whole game
    #[arg(long = "exclude-after", value_name = "WORDS", action = ArgAction::Append)]
    pub exclude_after: Vec<String>,

    /// Make the word options above case-insensitive
    #[arg(long = "ignore-case")]
    pub ignore_case: bool,

    /// Treat the word options above as regular expressions
    #[arg(long = "regex")]
    pub regex: bool,

    /// Matching by language precedes matching by region
    #[arg(long = "prioritize-languages")]
    pub prioritize_languages: bool,

    /// ROMs of earlier revisions will be prioritized
    #[arg(long = "early-revisions")]
    pub early_revisions: bool,

    /// ROMs of earlier versions will be prioritized
    #[arg(long = "early-versions")]
    pub early_versions: bool,

    /// Break ties by DAT order
    #[arg(long = "input-order")]
    pub input_order: bool,

    /// Parent ROMs will be prioritized over clones
    #[arg(long = "prefer-parents")]
    pub prefer_parents: bool,

    /// Prerelease dumps will be prioritized over released ones
    #[arg(long = "prefer-prereleases")]
    pub prefer_prereleases: bool,

    // Logging
    /// Companion log file for warnings and debug traces
    #[arg(long = "log-file", value_name = "PATH", default_value = "rompick.log")]
    pub log_file: PathBuf,

    /// Log more messages (useful when troubleshooting)
    #[arg(long = "debug")]
    pub debug: bool,

    /// Write a JSON report of the selection
    #[arg(long = "report", value_name = "PATH")]
    pub report: Option<PathBuf>,
}
