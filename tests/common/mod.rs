//! Shared test helpers: a naive byte-at-a-time reference scanner.

use briskly::ScanError;

/// Byte-at-a-time reference with the exact semantics of the SIMD scanner:
/// operators and primitive-run starts outside strings, a terminator equal
/// to the input length, EOF string errors before the empty check, and the
/// UTF-8 verdict last.
///
/// Primitive runs are tracked on the raw bytes, strings included, and the
/// string mask is applied afterwards. A run that starts inside a string and
/// continues past the closing quote therefore emits nothing, just like the
/// vectorized scanner.
pub fn reference_scan(json: &[u8]) -> Result<Vec<u32>, ScanError> {
    let mut offsets = Vec::new();
    let mut in_string = false;
    let mut pending_escape = false;
    let mut prev_primitive = false;
    let mut unescaped_error = false;

    for (i, &b) in json.iter().enumerate() {
        let is_escaped = pending_escape;
        pending_escape = b == b'\\' && !is_escaped;

        // The mask covers string contents plus the closing quote, but not
        // the opening quote.
        let string_mask;
        if b == b'"' && !is_escaped {
            string_mask = in_string;
            in_string = !in_string;
        } else {
            string_mask = in_string;
        }

        let whitespace = matches!(b, b' ' | b'\t' | b'\n' | b'\r');
        let op = matches!(b, b'{' | b'}' | b'[' | b']' | b':' | b',');
        let primitive = !whitespace && !op;
        let structural = op || (primitive && !prev_primitive);
        prev_primitive = primitive;

        if structural && !string_mask {
            offsets.push(i as u32);
        }
        if b < 0x20 && string_mask {
            unescaped_error = true;
        }
    }

    if in_string {
        return Err(ScanError::UnclosedString);
    }
    if unescaped_error {
        return Err(ScanError::UnescapedChars);
    }
    if offsets.is_empty() {
        return Err(ScanError::Empty);
    }
    offsets.push(json.len() as u32);
    if std::str::from_utf8(json).is_err() {
        return Err(ScanError::InvalidUtf8);
    }
    Ok(offsets)
}

#[test]
fn test_reference_scan_simple_object() {
    assert_eq!(reference_scan(br#"{"a":1}"#), Ok(vec![0, 1, 4, 5, 6, 7]));
}
