use once_cell::sync::Lazy;
use regex::Regex;

use crate::regions;

// Title markers follow the No-Intro naming convention: parenthesized tags
// after the base name, bracketed tags for dump status.
static SECTIONS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^()]+)\)").unwrap());
static BIOS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\[BIOS\]").unwrap());
static PROGRAM_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\((?:Test\s*)?Program\)").unwrap());
static ENHANCEMENT_CHIP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(Enhancement\s*Chip\)").unwrap());
static UNL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\(Unl\)").unwrap());
static PIRATE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\(Pirate\)").unwrap());
static PROMO_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\(Promo\)").unwrap());
static BETA_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(Beta(?:\s*([a-z0-9.]+))?\)").unwrap());
static PROTO_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(Proto(?:\s*([a-z0-9.]+))?\)").unwrap());
static SAMPLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(Sample(?:\s*([a-z0-9.]+))?\)").unwrap());
static DEMO_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(Demo(?:\s*([a-z0-9.]+))?\)").unwrap());
static REV_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\(Rev\s*([a-z0-9.]+)\)").unwrap());
static VERSION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\(v\s*([a-z0-9.]+)\)").unwrap());
static LANGUAGES_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(([a-z]{2}(?:[,+][a-z]{2})*)\)").unwrap());
static BAD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\[b\]").unwrap());

/// Absent prerelease labels sort after every present label under ascending
/// comparison, so absence loses to any concrete label once the direction is
/// flipped to descending.
pub const NO_LABEL: &str = "Z";

/// Attributes extracted from a single game title. Parsing never fails; a
/// title that matches nothing simply produces empty lists and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    pub regions: Vec<String>,
    pub languages: Vec<String>,
    pub revision: String,
    pub version: String,
    pub sample: String,
    pub demo: String,
    pub beta: String,
    pub proto: String,
    pub is_bad: bool,
    pub is_prerelease: bool,
}

pub fn parse_title(name: &str) -> ParsedTitle {
    let is_prerelease = BETA_REGEX.is_match(name)
        || PROTO_REGEX.is_match(name)
        || SAMPLE_REGEX.is_match(name)
        || DEMO_REGEX.is_match(name);

    ParsedTitle {
        regions: parse_regions(name),
        languages: parse_languages(name),
        revision: captured_or(&REV_REGEX, name, "0"),
        version: captured_or(&VERSION_REGEX, name, "0"),
        sample: captured_or(&SAMPLE_REGEX, name, NO_LABEL),
        demo: captured_or(&DEMO_REGEX, name, NO_LABEL),
        beta: captured_or(&BETA_REGEX, name, NO_LABEL),
        proto: captured_or(&PROTO_REGEX, name, NO_LABEL),
        is_bad: BAD_REGEX.is_match(name),
        is_prerelease,
    }
}

/// Region codes parsed from the title's parenthesized sections, in the
/// order encountered. An element may contribute several codes (World).
/// Duplicates are kept; expansion into candidates deduplicates.
pub fn parse_regions(name: &str) -> Vec<String> {
    let mut parsed = Vec::new();
    for section in SECTIONS_REGEX.captures_iter(name) {
        for element in section[1].split(',') {
            parsed.extend(regions::codes_matching(element.trim()));
        }
    }
    parsed
}

/// Explicit language codes from a language block such as `(En,Fr+De)`,
/// flattened on both separators and lowercased. Empty when the title has no
/// language block.
pub fn parse_languages(name: &str) -> Vec<String> {
    match LANGUAGES_REGEX.captures(name) {
        Some(captures) => captures[1]
            .split([',', '+'])
            .map(|lang| lang.trim().to_lowercase())
            .collect(),
        None => Vec::new(),
    }
}

pub fn is_bios(name: &str) -> bool {
    BIOS_REGEX.is_match(name)
}

pub fn is_program(name: &str) -> bool {
    PROGRAM_REGEX.is_match(name)
}

pub fn is_enhancement_chip(name: &str) -> bool {
    ENHANCEMENT_CHIP_REGEX.is_match(name)
}

pub fn is_unlicensed(name: &str) -> bool {
    UNL_REGEX.is_match(name)
}

pub fn is_pirate(name: &str) -> bool {
    PIRATE_REGEX.is_match(name)
}

pub fn is_promo(name: &str) -> bool {
    PROMO_REGEX.is_match(name)
}

pub fn is_proto(name: &str) -> bool {
    PROTO_REGEX.is_match(name)
}

pub fn is_beta(name: &str) -> bool {
    BETA_REGEX.is_match(name)
}

pub fn is_demo(name: &str) -> bool {
    DEMO_REGEX.is_match(name)
}

pub fn is_sample(name: &str) -> bool {
    SAMPLE_REGEX.is_match(name)
}

fn captured_or(regex: &Regex, name: &str, default: &str) -> String {
    regex
        .captures(name)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_yields_three_regions() {
        assert_eq!(parse_regions("Some Game (World)"), vec!["EUR", "JPN", "USA"]);
    }

    #[test]
    fn region_list_splits_on_commas() {
        assert_eq!(
            parse_regions("Some Game (USA, Europe)"),
            vec!["USA", "EUR"]
        );
    }

    #[test]
    fn languages_flatten_both_separators() {
        assert_eq!(
            parse_languages("Game (Europe) (En,Fr+De)"),
            vec!["en", "fr", "de"]
        );
        assert!(parse_languages("Game (Europe)").is_empty());
    }

    #[test]
    fn revision_and_version_default_to_zero() {
        let parsed = parse_title("Game (USA)");
        assert_eq!(parsed.revision, "0");
        assert_eq!(parsed.version, "0");

        let parsed = parse_title("Game (USA) (Rev 2) (v1.1)");
        assert_eq!(parsed.revision, "2");
        assert_eq!(parsed.version, "1.1");
    }

    #[test]
    fn prerelease_markers_set_flag_and_label() {
        let parsed = parse_title("Game (Japan) (Beta 2)");
        assert!(parsed.is_prerelease);
        assert_eq!(parsed.beta, "2");
        assert_eq!(parsed.proto, NO_LABEL);

        let unlabeled = parse_title("Game (Japan) (Proto)");
        assert!(unlabeled.is_prerelease);
        assert_eq!(unlabeled.proto, NO_LABEL);

        let released = parse_title("Game (Japan)");
        assert!(!released.is_prerelease);
    }

    #[test]
    fn bad_dump_marker() {
        assert!(parse_title("Game (USA) [b]").is_bad);
        assert!(!parse_title("Game (USA)").is_bad);
    }

    #[test]
    fn category_flags() {
        assert!(is_bios("[BIOS] Console BIOS (World)"));
        assert!(is_program("Diagnostics (Test Program) (USA)"));
        assert!(is_program("Util (Program) (USA)"));
        assert!(is_enhancement_chip("DSP1 (Enhancement Chip) (World)"));
        assert!(is_unlicensed("Game (USA) (Unl)"));
        assert!(is_pirate("Game (Asia) (Pirate)"));
        assert!(is_promo("Game (Japan) (Promo)"));
    }

    #[test]
    fn reparsing_parsed_fields_is_fixed_point() {
        let name = "Game (USA, Europe) (En,Fr) (Rev 3) (Beta 1) [b]";
        let parsed = parse_title(name);
        let canonical = format!(
            "Game ({}) ({}) (Rev {}) (Beta {})",
            "USA, Europe",
            parsed.languages.join(","),
            parsed.revision,
            parsed.beta
        );
        let reparsed = parse_title(&canonical);
        assert_eq!(reparsed.regions, parsed.regions);
        assert_eq!(reparsed.languages, parsed.languages);
        assert_eq!(reparsed.revision, parsed.revision);
        assert_eq!(reparsed.beta, parsed.beta);
    }
}
