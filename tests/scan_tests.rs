//! Integration tests for structural index construction.

mod common;

use briskly::{ScanError, StructuralIndex, build_structural_index};
use common::reference_scan;

/// Build an index and cross-check the offsets against the naive reference.
fn checked_offsets(json: &[u8]) -> Vec<u32> {
    let index = StructuralIndex::build(json).unwrap();
    assert_eq!(
        index.offsets(),
        reference_scan(json).unwrap().as_slice(),
        "scanner disagrees with the reference"
    );
    index.offsets().to_vec()
}

// ============================================================================
// Offsets of well-formed documents
// ============================================================================

#[test]
fn test_object_with_one_field() {
    // Offsets of `{`, `"`, `:`, `1`, `}`, plus the terminator.
    assert_eq!(checked_offsets(br#"{"a":1}"#), vec![0, 1, 4, 5, 6, 7]);
}

#[test]
fn test_array_of_numbers_with_spaces() {
    assert_eq!(
        checked_offsets(b"[1, 2, 3]"),
        vec![0, 1, 2, 4, 5, 7, 8, 9]
    );
}

#[test]
fn test_bare_string_document() {
    // One string token: only the opening quote and the terminator.
    assert_eq!(checked_offsets(br#""hello""#), vec![0, 7]);
}

#[test]
fn test_escaped_quote_does_not_close_string() {
    assert_eq!(checked_offsets(br#""he\"llo""#), vec![0, 9]);
}

#[test]
fn test_even_backslash_run_lets_quote_close() {
    // The string holds one literal backslash; its trailing quote is real.
    assert_eq!(checked_offsets(br#""he\\""#), vec![0, 6]);
}

#[test]
fn test_primitive_run_emits_single_offset() {
    // `true` is one run: one offset at its first byte.
    assert_eq!(checked_offsets(b" true "), vec![1, 6]);
}

#[test]
fn test_every_operator_outside_strings_is_emitted() {
    let json = br#"{"a":[1,2],"b":{}}"#;
    let offsets = checked_offsets(json);
    for (i, &b) in json.iter().enumerate() {
        let in_string = matches!(i, 2 | 12); // the key bytes `a` and `b`
        if matches!(b, b'{' | b'}' | b'[' | b']' | b':' | b',') && !in_string {
            assert!(
                offsets.contains(&(i as u32)),
                "operator at {i} missing from {offsets:?}"
            );
        }
    }
}

#[test]
fn test_deeply_nested_operators() {
    assert_eq!(
        checked_offsets(b"[[[]]]"),
        vec![0, 1, 2, 3, 4, 5, 6]
    );
}

// ============================================================================
// Terminator and determinism
// ============================================================================

#[test]
fn test_terminator_equals_input_length() {
    for json in [&br#"{"a":1}"#[..], &b"[1,2,3]"[..], &b"null"[..], &br#""s""#[..]] {
        let index = StructuralIndex::build(json).unwrap();
        assert_eq!(*index.offsets().last().unwrap() as usize, json.len());
    }
}

#[test]
fn test_offsets_strictly_increasing() {
    let json = br#"{"users":[{"id":1,"name":"a"},{"id":2,"name":"b"}],"total":2}"#;
    let offsets = checked_offsets(json);
    for pair in offsets.windows(2) {
        assert!(pair[0] < pair[1], "not increasing: {pair:?}");
    }
}

#[test]
fn test_scanning_twice_yields_identical_output() {
    let json = br#"{"a":[1,2,3],"b":"c d e"}"#;
    let first = StructuralIndex::build(json).unwrap();
    let second = StructuralIndex::build(json).unwrap();
    assert_eq!(first.offsets(), second.offsets());
}

// ============================================================================
// Error cases
// ============================================================================

#[test]
fn test_unclosed_string() {
    assert_eq!(
        StructuralIndex::build(br#""unterminated"#).unwrap_err(),
        ScanError::UnclosedString
    );
}

#[test]
fn test_unclosed_string_after_escaped_quote() {
    assert_eq!(
        StructuralIndex::build(br#""ends with \""#).unwrap_err(),
        ScanError::UnclosedString
    );
}

#[test]
fn test_control_byte_inside_string() {
    assert_eq!(
        StructuralIndex::build(b"\"a\x01b\"").unwrap_err(),
        ScanError::UnescapedChars
    );
}

#[test]
fn test_control_byte_outside_string_is_a_primitive() {
    // Outside strings a control byte is just an invalid primitive for
    // stage 2 to reject; stage 1 indexes it.
    let json = b"[\x01]";
    assert_eq!(checked_offsets(json), vec![0, 1, 2, 3]);
}

#[test]
fn test_whitespace_only_is_empty() {
    assert_eq!(StructuralIndex::build(b"   ").unwrap_err(), ScanError::Empty);
}

#[test]
fn test_zero_length_input_is_empty() {
    assert_eq!(StructuralIndex::build(b"").unwrap_err(), ScanError::Empty);
}

#[test]
fn test_capacity_is_checked_up_front() {
    let mut index = StructuralIndex::with_byte_capacity(4);
    assert_eq!(
        build_structural_index(br#"{"a":1}"#, &mut index),
        Err(ScanError::Capacity)
    );
}

#[test]
fn test_invalid_utf8_inside_string() {
    assert_eq!(
        StructuralIndex::build(b"[\"\xFF\"]").unwrap_err(),
        ScanError::InvalidUtf8
    );
}

#[test]
fn test_unclosed_string_wins_over_invalid_utf8() {
    assert_eq!(
        StructuralIndex::build(b"\"\xFF").unwrap_err(),
        ScanError::UnclosedString
    );
}

#[test]
fn test_multibyte_utf8_is_accepted() {
    let json = "{\"emoji\":\"\u{1F600}\",\"text\":\"caf\u{e9}\"}".as_bytes();
    let index = StructuralIndex::build(json).unwrap();
    assert_eq!(index.offsets(), reference_scan(json).unwrap().as_slice());
}

// ============================================================================
// Window and step boundaries
// ============================================================================

/// A comma-separated run of `"x":1` pairs sized to cross several 128-byte
/// steps.
fn long_document(pairs: usize) -> Vec<u8> {
    let mut json = Vec::new();
    json.push(b'{');
    for i in 0..pairs {
        if i > 0 {
            json.push(b',');
        }
        json.extend_from_slice(format!("\"key{i}\":{i}").as_bytes());
    }
    json.push(b'}');
    json
}

#[test]
fn test_document_crossing_many_steps() {
    let json = long_document(200);
    assert!(json.len() > 4 * 128);
    checked_offsets(&json);
}

#[test]
fn test_exact_step_multiples() {
    // Whole numbers of 64-byte windows and 128-byte steps.
    for target in [64usize, 128, 192, 256] {
        let mut json = long_document(40);
        json.truncate(target - 2);
        // Close the document without splitting a token.
        while json.last().is_some_and(|&b| b != b',') {
            json.pop();
        }
        json.pop();
        json.push(b'}');
        let padded = target.max(json.len());
        json.resize(padded, b' ');
        // Whatever the exact shape, scanner and reference must agree.
        let result = StructuralIndex::build(&json);
        match (&result, reference_scan(&json)) {
            (Ok(index), Ok(expected)) => assert_eq!(index.offsets(), expected.as_slice()),
            (Err(got), Err(want)) => assert_eq!(*got, want),
            (got, want) => panic!("scanner {got:?} disagrees with reference {want:?}"),
        }
    }
}

#[test]
fn test_string_spanning_window_boundary() {
    // A string whose contents straddle the 64- and 128-byte boundaries.
    let mut json = Vec::from(&br#"{"k":""#[..]);
    json.extend_from_slice(&[b'x'; 150]);
    json.extend_from_slice(br#""}"#);
    checked_offsets(&json);
}

#[test]
fn test_backslash_run_across_window_boundary() {
    // Position a backslash run so it straddles byte 63/64 inside a string;
    // parity across the boundary decides whether the closing quote is real.
    for run_len in 1..=6 {
        for lead in 55..=70 {
            let mut json = Vec::from(&b"\""[..]);
            json.extend_from_slice(&vec![b'a'; lead]);
            json.extend_from_slice(&vec![b'\\'; run_len]);
            json.extend_from_slice(b"\"");
            let result = StructuralIndex::build(&json);
            match (result, reference_scan(&json)) {
                (Ok(index), Ok(expected)) => {
                    assert_eq!(
                        index.offsets(),
                        expected.as_slice(),
                        "lead {lead}, run {run_len}"
                    );
                }
                (Err(got), Err(want)) => {
                    assert_eq!(got, want, "lead {lead}, run {run_len}");
                }
                (got, want) => {
                    panic!("lead {lead}, run {run_len}: scanner {got:?} vs reference {want:?}")
                }
            }
        }
    }
}

#[test]
fn test_quote_on_window_boundary() {
    for quote_at in 62..=66 {
        let mut json = vec![b' '; quote_at];
        json[0] = b'[';
        json.push(b'"');
        json.extend_from_slice(b"abc");
        json.push(b'"');
        json.push(b']');
        checked_offsets(&json);
    }
}

#[test]
fn test_windowing_invariance_on_prefixes() {
    // Offsets below a cut point outside any string are identical whether
    // the document is scanned whole or cut there and padded with spaces.
    let json = long_document(60);
    assert!(json.len() > 256);
    let full = StructuralIndex::build(&json).unwrap();

    // Cut just after a comma so no token or string is split.
    let cut = json
        .iter()
        .enumerate()
        .filter(|&(i, &b)| b == b',' && i >= 128)
        .map(|(i, _)| i + 1)
        .next()
        .unwrap();
    let mut prefix = json[..cut].to_vec();
    prefix.resize(json.len(), b' ');
    let partial = StructuralIndex::build(&prefix).unwrap();

    let below_cut = |offsets: &[u32]| {
        offsets
            .iter()
            .copied()
            .take_while(|&o| (o as usize) < cut)
            .collect::<Vec<_>>()
    };
    assert_eq!(below_cut(full.offsets()), below_cut(partial.offsets()));
}

// ============================================================================
// Buffer reuse
// ============================================================================

#[test]
fn test_index_reuse_shrinks_and_grows() {
    let mut index = StructuralIndex::with_byte_capacity(512);
    let big = long_document(30);
    build_structural_index(&big, &mut index).unwrap();
    let big_len = index.len();

    build_structural_index(b"[1]", &mut index).unwrap();
    assert_eq!(index.offsets(), &[0, 1, 2, 3]);
    assert!(index.len() < big_len);
}
