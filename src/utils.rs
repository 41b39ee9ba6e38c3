use regex::Regex;

/// True when any pattern in the list matches somewhere inside `name`.
pub fn matches_any(name: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|p| p.is_match(name))
}

/// Project a string onto per-character integers, with a sign multiplier.
/// Lexicographic comparison of the result equals character-wise comparison
/// of the input under the chosen direction.
pub fn to_int_list(s: &str, multiplier: i32) -> Vec<i32> {
    s.chars().map(|c| multiplier * c as i32).collect()
}

/// Zero-pad dotted numeric strings so that lexicographic order equals
/// component-wise numeric order across the whole group.
///
/// Each string is split on `.`; every position is left-padded with zeros to
/// the widest value seen at that position. Strings keep their own number of
/// components.
pub fn add_padding(values: &[String]) -> Vec<String> {
    let parts_list: Vec<Vec<&str>> = values.iter().map(|s| s.split('.').collect()).collect();
    let max_parts = parts_list.iter().map(|p| p.len()).max().unwrap_or(0);
    let max_lengths: Vec<usize> = (0..max_parts)
        .map(|i| {
            parts_list
                .iter()
                .map(|parts| parts.get(i).map_or(0, |part| part.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    parts_list
        .into_iter()
        .map(|parts| {
            parts
                .iter()
                .enumerate()
                .map(|(i, part)| format!("{:0>width$}", part, width = max_lengths[i]))
                .collect::<Vec<_>>()
                .join(".")
        })
        .collect()
}

/// True for strings with at least one non-whitespace character.
pub fn is_valid(s: &str) -> bool {
    !s.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_aligns_single_components() {
        let padded = add_padding(&["1".into(), "10".into(), "2".into()]);
        assert_eq!(padded, vec!["01", "10", "02"]);
    }

    #[test]
    fn padding_is_per_position() {
        let padded = add_padding(&["1.2".into(), "1.10".into(), "2".into()]);
        assert_eq!(padded, vec!["1.02", "1.10", "2"]);
    }

    #[test]
    fn padding_keeps_component_count() {
        let padded = add_padding(&["1".into(), "1.0.1".into()]);
        assert_eq!(padded, vec!["1", "1.0.1"]);
    }

    #[test]
    fn int_list_sign_flips_direction() {
        assert_eq!(to_int_list("01", 1), vec!['0' as i32, '1' as i32]);
        assert_eq!(to_int_list("01", -1), vec![-('0' as i32), -('1' as i32)]);
        // ascending: "01" sorts before "10"; descending: "10" sorts before "01"
        assert!(to_int_list("01", 1) < to_int_list("10", 1));
        assert!(to_int_list("10", -1) < to_int_list("01", -1));
    }

    #[test]
    fn matches_any_is_substring_search() {
        let patterns = vec![Regex::new("Virtual Console").unwrap()];
        assert!(matches_any("Game (USA) (Virtual Console)", &patterns));
        assert!(!matches_any("Game (USA)", &patterns));
    }

    #[test]
    fn blank_strings_are_not_valid() {
        assert!(is_valid("a"));
        assert!(!is_valid("   "));
        assert!(!is_valid(""));
    }
}
