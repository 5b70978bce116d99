//! SSE2 baseline backend for x86_64.
//!
//! Composes four 16-byte registers into 64-bit masks using explicit
//! per-character comparisons. SSE2 is universally available on all x86_64
//! processors.

use core::arch::x86_64::*;

use crate::ScanError;
use crate::bits::prefix_xor;
use crate::index::StructuralIndex;
use crate::scan::scan_document;
use crate::simd::SimdInput;
use crate::utf8::ScalarUtf8;

/// ASCII byte constants
const OPEN_BRACE: i8 = b'{' as i8;
const CLOSE_BRACE: i8 = b'}' as i8;
const OPEN_BRACKET: i8 = b'[' as i8;
const CLOSE_BRACKET: i8 = b']' as i8;
const COMMA: i8 = b',' as i8;
const COLON: i8 = b':' as i8;
const SPACE: i8 = b' ' as i8;
const TAB: i8 = b'\t' as i8;
const LINE_FEED: i8 = b'\n' as i8;
const CARRIAGE_RETURN: i8 = b'\r' as i8;

/// One 64-byte window in four SSE2 registers.
pub(crate) struct Sse2Input {
    v0: __m128i,
    v1: __m128i,
    v2: __m128i,
    v3: __m128i,
}

/// Compose the sign bits of four 16-byte registers into one 64-bit mask.
#[inline]
unsafe fn combine(m0: __m128i, m1: __m128i, m2: __m128i, m3: __m128i) -> u64 {
    // SAFETY: SSE2 is guaranteed to be available on all x86_64 processors.
    unsafe {
        let b0 = _mm_movemask_epi8(m0) as u64;
        let b1 = _mm_movemask_epi8(m1) as u64;
        let b2 = _mm_movemask_epi8(m2) as u64;
        let b3 = _mm_movemask_epi8(m3) as u64;
        b0 | (b1 << 16) | (b2 << 32) | (b3 << 48)
    }
}

/// Bytes of `v` at or below `bound`, compared unsigned.
///
/// SSE2 byte compares are signed, so the test is phrased through the
/// unsigned max instead: raising a byte to `bound` changes nothing exactly
/// when the byte does not exceed it.
#[inline]
unsafe fn below_or_equal(v: __m128i, bound: __m128i) -> __m128i {
    // SAFETY: SSE2 only.
    unsafe { _mm_cmpeq_epi8(_mm_max_epu8(v, bound), bound) }
}

/// Whitespace bytes of one register: space, tab, line feed, carriage return.
#[inline]
unsafe fn whitespace_bytes(v: __m128i) -> __m128i {
    // SAFETY: SSE2 only.
    unsafe {
        let space = _mm_cmpeq_epi8(v, _mm_set1_epi8(SPACE));
        let tab = _mm_cmpeq_epi8(v, _mm_set1_epi8(TAB));
        let line_feed = _mm_cmpeq_epi8(v, _mm_set1_epi8(LINE_FEED));
        let carriage_return = _mm_cmpeq_epi8(v, _mm_set1_epi8(CARRIAGE_RETURN));
        _mm_or_si128(_mm_or_si128(space, tab), _mm_or_si128(line_feed, carriage_return))
    }
}

/// Operator bytes of one register: braces, brackets, colon, comma.
#[inline]
unsafe fn operator_bytes(v: __m128i) -> __m128i {
    // SAFETY: SSE2 only.
    unsafe {
        let open_brace = _mm_cmpeq_epi8(v, _mm_set1_epi8(OPEN_BRACE));
        let close_brace = _mm_cmpeq_epi8(v, _mm_set1_epi8(CLOSE_BRACE));
        let open_bracket = _mm_cmpeq_epi8(v, _mm_set1_epi8(OPEN_BRACKET));
        let close_bracket = _mm_cmpeq_epi8(v, _mm_set1_epi8(CLOSE_BRACKET));
        let comma = _mm_cmpeq_epi8(v, _mm_set1_epi8(COMMA));
        let colon = _mm_cmpeq_epi8(v, _mm_set1_epi8(COLON));
        let braces = _mm_or_si128(open_brace, close_brace);
        let brackets = _mm_or_si128(open_bracket, close_bracket);
        let delims = _mm_or_si128(comma, colon);
        _mm_or_si128(_mm_or_si128(braces, brackets), delims)
    }
}

impl SimdInput for Sse2Input {
    type Validator = ScalarUtf8;

    #[inline]
    unsafe fn new(chunk: &[u8]) -> Self {
        debug_assert!(chunk.len() >= 64);
        // SAFETY: the caller guarantees 64 readable bytes; loads are
        // unaligned.
        unsafe {
            Self {
                v0: _mm_loadu_si128(chunk.as_ptr() as *const __m128i),
                v1: _mm_loadu_si128(chunk.as_ptr().add(16) as *const __m128i),
                v2: _mm_loadu_si128(chunk.as_ptr().add(32) as *const __m128i),
                v3: _mm_loadu_si128(chunk.as_ptr().add(48) as *const __m128i),
            }
        }
    }

    #[inline]
    fn eq(&self, byte: u8) -> u64 {
        // SAFETY: SSE2 is guaranteed to be available on all x86_64
        // processors.
        unsafe {
            let splat = _mm_set1_epi8(byte as i8);
            combine(
                _mm_cmpeq_epi8(self.v0, splat),
                _mm_cmpeq_epi8(self.v1, splat),
                _mm_cmpeq_epi8(self.v2, splat),
                _mm_cmpeq_epi8(self.v3, splat),
            )
        }
    }

    #[inline]
    fn lteq(&self, byte: u8) -> u64 {
        // SAFETY: SSE2 only.
        unsafe {
            let bound = _mm_set1_epi8(byte as i8);
            combine(
                below_or_equal(self.v0, bound),
                below_or_equal(self.v1, bound),
                below_or_equal(self.v2, bound),
                below_or_equal(self.v3, bound),
            )
        }
    }

    #[inline]
    fn whitespace_and_operators(&self) -> (u64, u64) {
        // SAFETY: SSE2 only.
        unsafe {
            let whitespace = combine(
                whitespace_bytes(self.v0),
                whitespace_bytes(self.v1),
                whitespace_bytes(self.v2),
                whitespace_bytes(self.v3),
            );
            let op = combine(
                operator_bytes(self.v0),
                operator_bytes(self.v1),
                operator_bytes(self.v2),
                operator_bytes(self.v3),
            );
            (whitespace, op)
        }
    }

    #[inline]
    fn quote_mask(quotes: u64) -> u64 {
        prefix_xor(quotes)
    }
}

/// Build the structural index of `json` using the SSE2 baseline backend.
pub fn build_structural_index(json: &[u8], index: &mut StructuralIndex) -> Result<(), ScanError> {
    // SAFETY: SSE2 is guaranteed to be available on all x86_64 processors.
    unsafe { build_sse2(json, index) }
}

#[target_feature(enable = "sse2")]
unsafe fn build_sse2(json: &[u8], index: &mut StructuralIndex) -> Result<(), ScanError> {
    // SAFETY: instruction-set support is established by the wrapper.
    unsafe { scan_document::<Sse2Input>(json, index) }
}
