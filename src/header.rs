use std::path::Path;

use anyhow::Context;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// A detector file declares rules that strip or reorder container headers
/// before hashing, so on-disk dumps match the catalog's canonical digests.
/// The first rule whose tests all pass is applied; later rules are ignored.
#[derive(Debug, Clone)]
pub struct Rule {
    start_offset: usize,
    /// `None` means EOF.
    end_offset: Option<usize>,
    operation: Operation,
    tests: Vec<Test>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    None,
    Bitswap,
    Byteswap,
    Wordswap,
}

#[derive(Debug, Clone)]
enum Test {
    Data {
        offset: usize,
        value: Vec<u8>,
        expected: bool,
    },
    Boolean {
        op: BoolOp,
        offset: usize,
        width: usize,
        mask: u128,
        value: u128,
        expected: bool,
    },
    File {
        size: FileSize,
        operator: SizeOp,
        expected: bool,
    },
}

#[derive(Debug, Clone, Copy)]
enum BoolOp {
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy)]
enum FileSize {
    Bytes(u64),
    PowerOfTwo,
}

#[derive(Debug, Clone, Copy)]
enum SizeOp {
    Equal,
    Less,
    Greater,
}

impl Rule {
    pub fn matches(&self, data: &[u8]) -> bool {
        self.tests.iter().all(|test| test.passes(data))
    }

    /// Slice the configured range out of `data` and run the operation on it.
    pub fn apply(&self, data: &[u8]) -> Vec<u8> {
        let slice = self.slice(data);
        match self.operation {
            Operation::None => slice.to_vec(),
            Operation::Bitswap => slice.iter().rev().copied().collect(),
            Operation::Byteswap => invert_chunks(slice, 2),
            Operation::Wordswap => invert_chunks(slice, 4),
        }
    }

    fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        let len = data.len();
        let start = self.start_offset.min(len);
        let end = self.end_offset.map_or(len, |e| e.min(len)).max(start);
        &data[start..end]
    }
}

impl Test {
    fn passes(&self, data: &[u8]) -> bool {
        match self {
            Test::Data {
                offset,
                value,
                expected,
            } => {
                let actual = clamped(data, *offset, value.len());
                (big_endian_eq(actual, value)) == *expected
            }
            Test::Boolean {
                op,
                offset,
                width,
                mask,
                value,
                expected,
            } => {
                let actual = int_at(data, *offset, *width);
                let computed = match op {
                    BoolOp::And => mask & actual,
                    BoolOp::Or => mask | actual,
                    BoolOp::Xor => mask ^ actual,
                };
                (computed == *value) == *expected
            }
            Test::File {
                size,
                operator,
                expected,
            } => {
                let len = data.len() as u64;
                let outcome = match size {
                    FileSize::PowerOfTwo => len.is_power_of_two(),
                    FileSize::Bytes(size) => match operator {
                        SizeOp::Equal => len == *size,
                        SizeOp::Less => len < *size,
                        SizeOp::Greater => len > *size,
                    },
                };
                outcome == *expected
            }
        }
    }
}

/// Apply the first matching rule, or return the buffer untouched when no
/// rule matches.
pub fn transform(rules: &[Rule], data: Vec<u8>) -> Vec<u8> {
    for rule in rules {
        if rule.matches(&data) {
            return rule.apply(&data);
        }
    }
    data
}

/// Reverse the order of fixed-size chunks, walking from the end of the
/// slice backwards. A partial head chunk stays verbatim at the start.
fn invert_chunks(data: &[u8], chunk: usize) -> Vec<u8> {
    let remainder = data.len() % chunk;
    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&data[..remainder]);
    let mut i = data.len();
    while i > remainder {
        out.extend_from_slice(&data[i - chunk..i]);
        i -= chunk;
    }
    out
}

fn clamped(data: &[u8], offset: usize, len: usize) -> &[u8] {
    let start = offset.min(data.len());
    let end = (offset.saturating_add(len)).min(data.len());
    &data[start..end]
}

/// Compare two byte strings as big-endian unsigned integers of arbitrary
/// width (a short read past EOF still compares numerically).
fn big_endian_eq(a: &[u8], b: &[u8]) -> bool {
    let strip = |bytes: &[u8]| {
        let first = bytes.iter().position(|&x| x != 0).unwrap_or(bytes.len());
        bytes[first..].to_vec()
    };
    strip(a) == strip(b)
}

fn int_at(data: &[u8], offset: usize, width: usize) -> u128 {
    clamped(data, offset, width)
        .iter()
        .fold(0u128, |acc, &byte| (acc << 8) | byte as u128)
}

/// Parse an XML detector file into its rule list. A malformed detector is a
/// hard error for the run.
pub fn parse_detector(path: &Path) -> anyhow::Result<Vec<Rule>> {
    let mut reader = Reader::from_file(path)
        .with_context(|| format!("unable to open detector file: {}", path.display()))?;
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut rules = Vec::new();
    let mut current: Option<Rule> = None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .with_context(|| format!("malformed XML in detector file: {}", path.display()))?
        {
            Event::Start(ref e) => {
                let name = e.name();
                match name.as_ref() {
                    b"rule" => current = Some(rule_from_attributes(e)?),
                    b"data" | b"and" | b"or" | b"xor" | b"file" => {
                        if let Some(rule) = current.as_mut() {
                            rule.tests.push(test_from_attributes(name.as_ref(), e)?);
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(ref e) => {
                let name = e.name();
                match name.as_ref() {
                    b"rule" => rules.push(rule_from_attributes(e)?),
                    b"data" | b"and" | b"or" | b"xor" | b"file" => {
                        if let Some(rule) = current.as_mut() {
                            rule.tests.push(test_from_attributes(name.as_ref(), e)?);
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => {
                if e.name().as_ref() == b"rule" {
                    if let Some(rule) = current.take() {
                        rules.push(rule);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rules)
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .map(|attr| String::from_utf8_lossy(&attr.value).trim().to_string())
}

fn parse_hex_offset(value: Option<String>) -> anyhow::Result<usize> {
    match value {
        Some(text) => usize::from_str_radix(&text, 16)
            .with_context(|| format!("invalid hex offset: {text}")),
        None => Ok(0),
    }
}

fn parse_expected(value: Option<String>) -> anyhow::Result<bool> {
    match value.as_deref() {
        None => Ok(true),
        Some(text) if text.eq_ignore_ascii_case("true") => Ok(true),
        Some(text) if text.eq_ignore_ascii_case("false") => Ok(false),
        Some(text) => anyhow::bail!("cannot convert {text} to boolean"),
    }
}

fn rule_from_attributes(e: &BytesStart<'_>) -> anyhow::Result<Rule> {
    let start_offset = parse_hex_offset(attribute(e, b"start_offset"))?;
    let end_offset = match attribute(e, b"end_offset") {
        None => None,
        Some(text) if text.eq_ignore_ascii_case("EOF") => None,
        Some(text) => Some(
            usize::from_str_radix(&text, 16)
                .with_context(|| format!("invalid hex end_offset: {text}"))?,
        ),
    };
    let operation = match attribute(e, b"operation").as_deref() {
        None | Some("none") => Operation::None,
        Some("bitswap") => Operation::Bitswap,
        Some("byteswap") => Operation::Byteswap,
        Some("wordswap") => Operation::Wordswap,
        Some(other) => anyhow::bail!("unknown rule operation: {other}"),
    };
    Ok(Rule {
        start_offset,
        end_offset,
        operation,
        tests: Vec::new(),
    })
}

fn test_from_attributes(tag: &[u8], e: &BytesStart<'_>) -> anyhow::Result<Test> {
    let expected = parse_expected(attribute(e, b"rules"))?;
    match tag {
        b"data" => {
            let value = attribute(e, b"value")
                .ok_or_else(|| anyhow::anyhow!("data test is missing its value attribute"))?;
            let value = hex::decode(&value)
                .with_context(|| format!("data test value must be even-length hex: {value}"))?;
            Ok(Test::Data {
                offset: parse_hex_offset(attribute(e, b"offset"))?,
                value,
                expected,
            })
        }
        b"and" | b"or" | b"xor" => {
            let op = match tag {
                b"and" => BoolOp::And,
                b"or" => BoolOp::Or,
                _ => BoolOp::Xor,
            };
            let mask_text = attribute(e, b"mask")
                .ok_or_else(|| anyhow::anyhow!("boolean test is missing its mask attribute"))?;
            let value_text = attribute(e, b"value")
                .ok_or_else(|| anyhow::anyhow!("boolean test is missing its value attribute"))?;
            if mask_text.len() != value_text.len() || mask_text.len() % 2 != 0 {
                anyhow::bail!(
                    "mask ({mask_text}) and value ({value_text}) must be the same even length"
                );
            }
            if mask_text.len() > 32 {
                anyhow::bail!("boolean test mask is wider than 16 bytes: {mask_text}");
            }
            Ok(Test::Boolean {
                op,
                offset: parse_hex_offset(attribute(e, b"offset"))?,
                width: mask_text.len() / 2,
                mask: u128::from_str_radix(&mask_text, 16)
                    .with_context(|| format!("invalid hex mask: {mask_text}"))?,
                value: u128::from_str_radix(&value_text, 16)
                    .with_context(|| format!("invalid hex value: {value_text}"))?,
                expected,
            })
        }
        b"file" => {
            let size_text = attribute(e, b"size")
                .ok_or_else(|| anyhow::anyhow!("file test is missing its size attribute"))?;
            let size = if size_text == "PO2" {
                FileSize::PowerOfTwo
            } else {
                FileSize::Bytes(
                    u64::from_str_radix(&size_text, 16)
                        .with_context(|| format!("invalid hex size: {size_text}"))?,
                )
            };
            let operator = match attribute(e, b"operator").as_deref() {
                None | Some("equal") => SizeOp::Equal,
                Some("less") => SizeOp::Less,
                Some("greater") => SizeOp::Greater,
                Some(other) => anyhow::bail!("invalid file test operator: {other}"),
            };
            Ok(Test::File {
                size,
                operator,
                expected,
            })
        }
        _ => unreachable!("caller dispatches only known test tags"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn bare_rule(operation: Operation) -> Rule {
        Rule {
            start_offset: 0,
            end_offset: None,
            operation,
            tests: Vec::new(),
        }
    }

    #[test]
    fn bitswap_reverses_the_slice() {
        let rule = bare_rule(Operation::Bitswap);
        assert_eq!(rule.apply(&[0x01, 0x02, 0x03]), vec![0x03, 0x02, 0x01]);
    }

    #[test]
    fn byteswap_reverses_pair_order() {
        let rule = bare_rule(Operation::Byteswap);
        assert_eq!(rule.apply(&[1, 2, 3, 4]), vec![3, 4, 1, 2]);
    }

    #[test]
    fn wordswap_reverses_quad_order() {
        let rule = bare_rule(Operation::Wordswap);
        assert_eq!(rule.apply(&[1, 2, 3, 4, 5, 6, 7, 8]), vec![5, 6, 7, 8, 1, 2, 3, 4]);
    }

    #[test]
    fn partial_head_chunk_is_preserved() {
        let rule = bare_rule(Operation::Byteswap);
        assert_eq!(rule.apply(&[9, 1, 2, 3, 4]), vec![9, 3, 4, 1, 2]);
    }

    #[test]
    fn offsets_slice_before_the_operation() {
        let rule = Rule {
            start_offset: 2,
            end_offset: Some(4),
            operation: Operation::None,
            tests: Vec::new(),
        };
        assert_eq!(rule.apply(&[1, 2, 3, 4, 5]), vec![3, 4]);
        // offsets beyond the buffer clamp to its length
        assert_eq!(rule.apply(&[1]), Vec::<u8>::new());
    }

    #[test]
    fn data_test_compares_big_endian() {
        let test = Test::Data {
            offset: 1,
            value: vec![0x02, 0x03],
            expected: true,
        };
        assert!(test.passes(&[0x01, 0x02, 0x03, 0x04]));
        assert!(!test.passes(&[0x01, 0x02, 0x04, 0x04]));

        let inverted = Test::Data {
            offset: 1,
            value: vec![0x02, 0x03],
            expected: false,
        };
        assert!(!inverted.passes(&[0x01, 0x02, 0x03, 0x04]));
        assert!(inverted.passes(&[0x01, 0x02, 0x04, 0x04]));
    }

    #[test]
    fn boolean_and_test_masks_the_read() {
        let test = Test::Boolean {
            op: BoolOp::And,
            offset: 0,
            width: 1,
            mask: 0xF0,
            value: 0xA0,
            expected: true,
        };
        assert!(test.passes(&[0xAF]));
        assert!(!test.passes(&[0x0F]));
    }

    #[test]
    fn file_tests_cover_operators_and_po2() {
        let equal = Test::File {
            size: FileSize::Bytes(4),
            operator: SizeOp::Equal,
            expected: true,
        };
        assert!(equal.passes(&[0; 4]));
        assert!(!equal.passes(&[0; 5]));

        let less = Test::File {
            size: FileSize::Bytes(4),
            operator: SizeOp::Less,
            expected: true,
        };
        assert!(less.passes(&[0; 3]));

        let po2 = Test::File {
            size: FileSize::PowerOfTwo,
            operator: SizeOp::Equal,
            expected: true,
        };
        assert!(po2.passes(&[0; 8]));
        assert!(!po2.passes(&[0; 6]));
        assert!(!po2.passes(&[]));
    }

    #[test]
    fn transform_applies_first_matching_rule_only() {
        let gated = Rule {
            start_offset: 1,
            end_offset: None,
            operation: Operation::None,
            tests: vec![Test::Data {
                offset: 0,
                value: vec![0xFF],
                expected: true,
            }],
        };
        let fallback = bare_rule(Operation::Bitswap);
        let rules = vec![gated, fallback];

        // first rule matches: header byte stripped
        assert_eq!(transform(&rules, vec![0xFF, 1, 2]), vec![1, 2]);
        // first rule fails its test: second rule reverses
        assert_eq!(transform(&rules, vec![0x00, 1, 2]), vec![2, 1, 0x00]);
    }

    #[test]
    fn no_matching_rule_leaves_data_untouched() {
        let gated = Rule {
            start_offset: 0,
            end_offset: None,
            operation: Operation::Bitswap,
            tests: vec![Test::Data {
                offset: 0,
                value: vec![0xFF],
                expected: true,
            }],
        };
        assert_eq!(transform(&[gated], vec![1, 2, 3]), vec![1, 2, 3]);
    }

    #[test]
    fn parses_a_detector_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"<?xml version="1.0"?>
<detector>
  <name>Test Detector</name>
  <rule start_offset="10" operation="none">
    <data offset="0" value="4e45531a" rules="true"/>
    <file size="PO2" rules="false"/>
  </rule>
  <rule start_offset="0" end_offset="EOF" operation="byteswap"/>
</detector>
"#,
        )
        .unwrap();
        file.flush().unwrap();

        let rules = parse_detector(file.path()).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].start_offset, 0x10);
        assert_eq!(rules[0].tests.len(), 2);
        assert_eq!(rules[1].operation, Operation::Byteswap);
        assert!(rules[1].end_offset.is_none());
    }

    #[test]
    fn rejects_odd_length_data_values() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"<detector><rule><data value="abc"/></rule></detector>"#)
            .unwrap();
        file.flush().unwrap();
        assert!(parse_detector(file.path()).is_err());
    }
}
