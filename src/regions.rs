use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::RwLock;

/// One region the catalog may reference: the 3-letter code used by release
/// records, the country name pattern found in titles, and the languages the
/// region implies when a title carries no explicit language block.
#[derive(Debug, Clone)]
pub struct RegionData {
    pub code: String,
    pub pattern: Option<Regex>,
    pub languages: Vec<String>,
}

impl RegionData {
    fn new(code: &str, pattern: &str, languages: &[&str]) -> Self {
        Self {
            code: code.to_string(),
            pattern: Some(Regex::new(pattern).expect("built-in region pattern")),
            languages: languages.iter().map(|l| l.to_string()).collect(),
        }
    }

    fn unknown(code: &str) -> Self {
        Self {
            code: code.to_string(),
            pattern: None,
            languages: Vec::new(),
        }
    }
}

// Registry order matters: title sections probe entries in order, and the
// World convention relies on EUR, JPN and USA each carrying a World
// alternative so one (World) section yields all three regions.
static REGISTRY: Lazy<RwLock<Vec<RegionData>>> = Lazy::new(|| {
    RwLock::new(vec![
        // ASI/TAI language assignments are defaults, not verified
        RegionData::new("ASI", r"(?i)(Asia)", &["zh"]),
        RegionData::new("ARG", r"(?i)(Argentina)", &["es"]),
        RegionData::new("AUS", r"(?i)(Australia)", &["en"]),
        RegionData::new("BRA", r"(?i)(Brazil)", &["pt"]),
        RegionData::new("CAN", r"(?i)(Canada)", &["en", "fr"]),
        RegionData::new("CHN", r"(?i)((China)|(Hong Kong))", &["zh"]),
        RegionData::new("DAN", r"(?i)(Denmark)", &["da"]),
        RegionData::new("EUR", r"(?i)((Europe)|(World))", &["en"]),
        RegionData::new("FRA", r"(?i)(France)", &["fr"]),
        RegionData::new("FYN", r"(?i)(Finland)", &["fi"]),
        RegionData::new("GER", r"(?i)(Germany)", &["de"]),
        RegionData::new("GRE", r"(?i)(Greece)", &["el"]),
        RegionData::new("ITA", r"(?i)(Italy)", &["it"]),
        RegionData::new("JPN", r"(?i)((Japan)|(World))", &["ja"]),
        RegionData::new("HOL", r"(?i)(Netherlands)", &["nl"]),
        RegionData::new("KOR", r"(?i)(Korea)", &["ko"]),
        RegionData::new("MEX", r"(?i)(Mexico)", &["es"]),
        RegionData::new("NOR", r"(?i)(Norway)", &["no"]),
        RegionData::new("RUS", r"(?i)(Russia)", &["ru"]),
        RegionData::new("SPA", r"(?i)(Spain)", &["es"]),
        RegionData::new("SWE", r"(?i)(Sweden)", &["sv"]),
        RegionData::new("USA", r"(?i)((USA)|(World))", &["en"]),
        RegionData::new("TAI", r"(?i)(Taiwan)", &["zh"]),
    ])
});

/// Region codes whose pattern matches the given title section element, in
/// registry order. A single element may map to several regions (World).
pub fn codes_matching(element: &str) -> Vec<String> {
    let registry = REGISTRY.read().expect("region registry poisoned");
    registry
        .iter()
        .filter(|rd| {
            rd.pattern
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(element))
        })
        .map(|rd| rd.code.clone())
        .collect()
}

/// Look up a region by exact code.
pub fn find(code: &str) -> Option<RegionData> {
    let registry = REGISTRY.read().expect("region registry poisoned");
    registry.iter().find(|rd| rd.code == code).cloned()
}

/// Whether the code is part of the built-in table or was registered earlier.
pub fn is_known(code: &str) -> bool {
    find(code).is_some()
}

/// Fetch a region, registering a pattern-less entry for codes the built-in
/// table does not cover. Catalogs reference regions we have never heard of;
/// selection still works for them, they just imply no languages.
pub fn find_or_register(code: &str) -> RegionData {
    if let Some(found) = find(code) {
        return found;
    }
    let mut registry = REGISTRY.write().expect("region registry poisoned");
    // Re-check under the write lock; another caller may have raced us here.
    if let Some(found) = registry.iter().find(|rd| rd.code == code) {
        return found.clone();
    }
    log::warn!("unrecognized region code {code}, registering without a title pattern");
    let entry = RegionData::unknown(code);
    registry.push(entry.clone());
    entry
}

/// Union of the languages implied by the given region codes, preserving the
/// order of first appearance.
pub fn languages_for(codes: &[String]) -> Vec<String> {
    let registry = REGISTRY.read().expect("region registry poisoned");
    let mut languages: Vec<String> = Vec::new();
    for code in codes {
        if let Some(rd) = registry.iter().find(|rd| rd.code == *code) {
            for lang in &rd.languages {
                if !languages.contains(lang) {
                    languages.push(lang.clone());
                }
            }
        }
    }
    languages
}
