use std::cmp::Reverse;

use serde::Serialize;

use crate::candidates::Candidate;
use crate::config::Config;
use crate::utils::{add_padding, matches_any, to_int_list};

/// Region index assigned to candidates outside the user's preference list.
pub const UNSELECTED: i32 = 10_000;

/// Comparable projection of one candidate. Lower is better for every
/// field; the string fields are per-character integer lists whose sign
/// encodes the ascending/descending policy.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Score {
    pub region: i32,
    pub languages: i32,
    pub revision: Vec<i32>,
    pub version: Vec<i32>,
    pub sample: Vec<i32>,
    pub demo: Vec<i32>,
    pub beta: Vec<i32>,
    pub proto: Vec<i32>,
}

impl Default for Score {
    fn default() -> Self {
        Self {
            region: UNSELECTED,
            languages: 0,
            revision: Vec::new(),
            version: Vec::new(),
            sample: Vec::new(),
            demo: Vec::new(),
            beta: Vec::new(),
            proto: Vec::new(),
        }
    }
}

/// Zero-pad the dotted string fields group-locally, then assign every
/// candidate its score. Padding must happen per parent group so that
/// `Rev 2` and `Rev 10` compare numerically within the family.
pub fn pad_and_score(entries: &mut [Candidate], config: &Config) {
    pad_field(entries, |c| c.revision.clone(), |c, v| c.revision = v);
    pad_field(entries, |c| c.version.clone(), |c, v| c.version = v);
    pad_field(entries, |c| c.sample.clone(), |c, v| c.sample = v);
    pad_field(entries, |c| c.demo.clone(), |c, v| c.demo = v);
    pad_field(entries, |c| c.beta.clone(), |c, v| c.beta = v);
    pad_field(entries, |c| c.proto.clone(), |c, v| c.proto = v);

    let revision_mult = if config.early_revisions { 1 } else { -1 };
    let version_mult = if config.early_versions { 1 } else { -1 };
    let weight = config.language_weight as i32;

    for candidate in entries.iter_mut() {
        let region = config
            .regions
            .iter()
            .position(|r| *r == candidate.region)
            .map(|i| i as i32)
            .unwrap_or(UNSELECTED);
        // Selected languages contribute negative amounts, so more and
        // better-ranked matches sort earlier; unselected ones contribute 0.
        let languages = candidate
            .languages
            .iter()
            .map(|lang| {
                let rank = config
                    .languages
                    .iter()
                    .position(|l| l == lang)
                    .map(|i| i as i32)
                    .unwrap_or(-1);
                (rank + 1) * -weight
            })
            .sum();
        candidate.score = Score {
            region,
            languages,
            revision: to_int_list(&candidate.revision, revision_mult),
            version: to_int_list(&candidate.version, version_mult),
            // the latest prerelease always wins among prereleases
            sample: to_int_list(&candidate.sample, -1),
            demo: to_int_list(&candidate.demo, -1),
            beta: to_int_list(&candidate.beta, -1),
            proto: to_int_list(&candidate.proto, -1),
        };
    }
}

fn pad_field<G, S>(entries: &mut [Candidate], get: G, set: S)
where
    G: Fn(&Candidate) -> String,
    S: Fn(&mut Candidate, String),
{
    let values: Vec<String> = entries.iter().map(&get).collect();
    for (candidate, padded) in entries.iter_mut().zip(add_padding(&values)) {
        set(candidate, padded);
    }
}

/// Drop candidates the selection modifiers rule out entirely. Runs after
/// scoring and before ordering drives the output.
pub fn filter_group(mut entries: Vec<Candidate>, config: &Config) -> Vec<Candidate> {
    if config.only_selected_lang {
        entries.retain(|c| c.score.languages < 0);
    }
    if !config.all_regions {
        entries.retain(|c| {
            c.score.region != UNSELECTED
                || (config.all_regions_with_lang && c.score.languages < 0)
        });
    }
    entries
}

/// The candidate priority as a single comparable value. Field order is the
/// priority order; the derived lexicographic `Ord` is the total order the
/// selector walks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    bad: bool,
    prerelease: bool,
    avoided: bool,
    primary: i32,
    secondary: i32,
    clone_demoted: bool,
    input_position: usize,
    not_preferred: bool,
    revision: Vec<i32>,
    version: Vec<i32>,
    sample: Vec<i32>,
    demo: Vec<i32>,
    beta: Vec<i32>,
    proto: Vec<i32>,
    language_count: Reverse<usize>,
    not_parent: bool,
}

pub fn sort_key(candidate: &Candidate, config: &Config) -> SortKey {
    let score = &candidate.score;
    let (primary, secondary) = if config.prioritize_languages {
        (score.languages, score.region)
    } else {
        (score.region, score.languages)
    };
    SortKey {
        bad: candidate.is_bad,
        prerelease: config.prefer_prereleases ^ candidate.is_prerelease,
        avoided: matches_any(&candidate.name, &config.avoid),
        primary,
        secondary,
        clone_demoted: config.prefer_parents && !candidate.is_parent,
        input_position: if config.input_order {
            candidate.input_index
        } else {
            0
        },
        not_preferred: !matches_any(&candidate.name, &config.prefer),
        revision: score.revision.clone(),
        version: score.version.clone(),
        sample: score.sample.clone(),
        demo: score.demo.clone(),
        beta: score.beta.clone(),
        proto: score.proto.clone(),
        language_count: Reverse(candidate.languages.len()),
        not_parent: !candidate.is_parent,
    }
}

/// Sort a group best-first. The sort is stable, so ties not broken by the
/// key fall back to insertion order, which equals catalog order.
pub fn order_group(entries: &mut [Candidate], config: &Config) {
    entries.sort_by_cached_key(|candidate| sort_key(candidate, config));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::build_candidates;
    use crate::dat::{Catalog, DatGame, DatHeader, DatRom};
    use std::path::PathBuf;

    fn game(name: &str, clone_of: Option<&str>) -> DatGame {
        DatGame {
            name: name.to_string(),
            clone_of: clone_of.map(String::from),
            releases: Vec::new(),
            roms: vec![DatRom {
                name: format!("{name}.bin"),
                size: Some(4),
                sha1: Some("a94a8fe5ccb19ba61c4c0873d391e987982fbbd3".to_string()),
            }],
        }
    }

    fn scored_group(names: &[&str], config: &Config) -> Vec<Candidate> {
        let catalog = Catalog {
            path: PathBuf::from("test.dat"),
            header: DatHeader::default(),
            games: names
                .iter()
                .enumerate()
                .map(|(i, name)| game(name, (i > 0).then(|| names[0])))
                .collect(),
        };
        let mut groups = build_candidates(&catalog, config);
        assert_eq!(groups.len(), 1);
        let mut entries = groups.pop_first().unwrap().1;
        pad_and_score(&mut entries, config);
        entries
    }

    fn usa_eur_jpn() -> Config {
        Config {
            regions: vec!["USA".into(), "EUR".into(), "JPN".into()],
            ..Config::default()
        }
    }

    #[test]
    fn world_expansion_scores_regions_in_preference_order() {
        let config = usa_eur_jpn();
        let mut entries = scored_group(&["Some Game (World)"], &config);
        order_group(&mut entries, &config);
        // candidates were built EUR, JPN, USA; preference reorders them
        assert_eq!(entries[0].region, "USA");
        assert_eq!(entries[0].score.region, 0);
        assert_eq!(entries[1].region, "EUR");
        assert_eq!(entries[1].score.region, 1);
        assert_eq!(entries[2].region, "JPN");
        assert_eq!(entries[2].score.region, 2);
    }

    #[test]
    fn language_scores_scale_with_weight() {
        let mut config = Config {
            regions: vec!["JPN".into()],
            languages: vec!["en".into(), "ja".into()],
            ..Config::default()
        };
        let entries = scored_group(&["Game (Japan)"], &config);
        // ja is rank 1: (1+1) * -3
        assert_eq!(entries[0].score.languages, -6);

        config.language_weight = 1;
        let entries = scored_group(&["Game (Japan)"], &config);
        assert_eq!(entries[0].score.languages, -2);
    }

    #[test]
    fn unselected_languages_contribute_zero() {
        let config = Config {
            regions: vec!["JPN".into()],
            languages: vec!["en".into()],
            ..Config::default()
        };
        let entries = scored_group(&["Game (Japan)"], &config);
        assert_eq!(entries[0].score.languages, 0);
    }

    #[test]
    fn language_order_ties_stay_ties() {
        let config = Config {
            regions: vec!["EUR".into()],
            languages: vec!["en".into(), "fr".into()],
            ..Config::default()
        };
        let entries = scored_group(&["Game (Europe) (En,Fr)", "Game (Europe) (Fr,En)"], &config);
        // (0+1)*-3 + (1+1)*-3 in both orders
        assert_eq!(entries[0].score.languages, -9);
        assert_eq!(entries[1].score.languages, -9);

        let mut ordered = entries;
        order_group(&mut ordered, &config);
        // the parent flag is the last key to break this tie
        assert_eq!(ordered[0].name, "Game (Europe) (En,Fr)");
    }

    #[test]
    fn revisions_pad_group_locally_and_order_by_direction() {
        let config = Config {
            regions: vec!["USA".into()],
            early_revisions: true,
            ..Config::default()
        };
        let mut entries = scored_group(
            &["Game (USA) (Rev 1)", "Game (USA) (Rev 10)", "Game (USA) (Rev 2)"],
            &config,
        );
        assert_eq!(entries[0].revision, "01");
        assert_eq!(entries[1].revision, "10");
        assert_eq!(entries[2].revision, "02");

        order_group(&mut entries, &config);
        let names: Vec<&str> = entries.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Game (USA) (Rev 1)", "Game (USA) (Rev 2)", "Game (USA) (Rev 10)"]
        );
    }

    #[test]
    fn later_revisions_win_by_default() {
        let config = Config {
            regions: vec!["USA".into()],
            ..Config::default()
        };
        let mut entries = scored_group(
            &["Game (USA) (Rev 1)", "Game (USA) (Rev 10)", "Game (USA) (Rev 2)"],
            &config,
        );
        order_group(&mut entries, &config);
        assert_eq!(entries[0].name, "Game (USA) (Rev 10)");
    }

    #[test]
    fn released_dumps_beat_prereleases_unless_preferred() {
        let config = Config {
            regions: vec!["USA".into()],
            ..Config::default()
        };
        let mut entries = scored_group(&["Game (USA) (Beta 2)", "Game (USA)"], &config);
        order_group(&mut entries, &config);
        assert_eq!(entries[0].name, "Game (USA)");

        let config = Config {
            prefer_prereleases: true,
            ..config
        };
        let mut entries = scored_group(&["Game (USA) (Beta 2)", "Game (USA)"], &config);
        order_group(&mut entries, &config);
        assert_eq!(entries[0].name, "Game (USA) (Beta 2)");
    }

    #[test]
    fn bad_dumps_sort_last() {
        let config = Config {
            regions: vec!["USA".into()],
            ..Config::default()
        };
        let mut entries = scored_group(&["Game (USA) [b]", "Game (USA)"], &config);
        order_group(&mut entries, &config);
        assert_eq!(entries[0].name, "Game (USA)");
    }

    #[test]
    fn avoid_and_prefer_patterns_shift_priority() {
        let config = Config {
            regions: vec!["USA".into(), "EUR".into()],
            avoid: vec![regex::Regex::new("USA").unwrap()],
            ..Config::default()
        };
        let mut entries = scored_group(&["Game (USA)", "Game (Europe)"], &config);
        order_group(&mut entries, &config);
        // avoided names lose even against a worse region score
        assert_eq!(entries[0].name, "Game (Europe)");

        let config = Config {
            regions: vec!["USA".into()],
            prefer: vec![regex::Regex::new("Rev 1").unwrap()],
            ..Config::default()
        };
        let mut entries = scored_group(&["Game (USA) (Rev 2)", "Game (USA) (Rev 1)"], &config);
        order_group(&mut entries, &config);
        assert_eq!(entries[0].name, "Game (USA) (Rev 1)");
    }

    #[test]
    fn prefer_parents_demotes_clones() {
        let base = Config {
            regions: vec!["EUR".into()],
            ..Config::default()
        };
        // by default the later revision wins even though it is a clone
        let mut entries = scored_group(&["Game (Europe)", "Game (Europe) (Rev 1)"], &base);
        order_group(&mut entries, &base);
        assert_eq!(entries[0].name, "Game (Europe) (Rev 1)");

        let config = Config {
            prefer_parents: true,
            ..base
        };
        let mut entries = scored_group(&["Game (Europe)", "Game (Europe) (Rev 1)"], &config);
        order_group(&mut entries, &config);
        assert_eq!(entries[0].name, "Game (Europe)");
    }

    #[test]
    fn unselected_regions_are_filtered_unless_requested() {
        let config = usa_eur_jpn();
        let entries = scored_group(&["Game (Brazil)"], &config);
        assert!(filter_group(entries.clone(), &config).is_empty());

        let keep_all = Config {
            all_regions: true,
            ..usa_eur_jpn()
        };
        assert_eq!(filter_group(entries.clone(), &keep_all).len(), 1);

        let with_lang = Config {
            all_regions_with_lang: true,
            languages: vec!["pt".into()],
            ..usa_eur_jpn()
        };
        let scored = scored_group(&["Game (Brazil)"], &with_lang);
        assert_eq!(filter_group(scored, &with_lang).len(), 1);

        let wrong_lang = Config {
            all_regions_with_lang: true,
            languages: vec!["ja".into()],
            ..usa_eur_jpn()
        };
        let scored = scored_group(&["Game (Brazil)"], &wrong_lang);
        assert!(filter_group(scored, &wrong_lang).is_empty());
    }

    #[test]
    fn only_selected_lang_drops_unmatched_candidates() {
        let config = Config {
            regions: vec!["JPN".into(), "USA".into()],
            languages: vec!["en".into()],
            only_selected_lang: true,
            ..Config::default()
        };
        let entries = scored_group(&["Game (Japan)", "Game (USA)"], &config);
        let kept = filter_group(entries, &config);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].region, "USA");
    }

    #[test]
    fn ordering_is_deterministic_across_shuffles() {
        let config = usa_eur_jpn();
        let mut entries = scored_group(
            &[
                "Game (World)",
                "Game (USA) (Rev 1)",
                "Game (Japan) (Beta)",
                "Game (Europe) (En,Fr)",
            ],
            &config,
        );
        order_group(&mut entries, &config);
        let baseline: Vec<(String, String)> = entries
            .iter()
            .map(|c| (c.name.clone(), c.region.clone()))
            .collect();

        entries.reverse();
        // a reversed walk differs only in insertion order, which the key
        // does not consult for distinct candidates
        order_group(&mut entries, &config);
        let reordered: Vec<(String, String)> = entries
            .iter()
            .map(|c| (c.name.clone(), c.region.clone()))
            .collect();
        assert_eq!(baseline, reordered);
    }

    #[test]
    fn input_order_breaks_ties_when_enabled() {
        let config = Config {
            regions: vec!["EUR".into()],
            languages: vec!["en".into(), "fr".into()],
            input_order: true,
            ..Config::default()
        };
        let mut entries = scored_group(&["Game (Europe) (Fr,En)", "Game (Europe) (En,Fr)"], &config);
        entries.reverse();
        order_group(&mut entries, &config);
        assert_eq!(entries[0].name, "Game (Europe) (Fr,En)");
    }
}
