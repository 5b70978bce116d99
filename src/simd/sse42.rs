//! SSE4.2 backend for x86_64.
//!
//! Classifies whitespace and operators with a two-table nibble shuffle via
//! `_mm_shuffle_epi8`, so both masks emerge from one pass over each
//! register. SSE4.2 is available on roughly every x86_64 processor since
//! 2008.

use core::arch::x86_64::*;

use crate::ScanError;
use crate::bits::prefix_xor;
use crate::index::StructuralIndex;
use crate::scan::scan_document;
use crate::simd::SimdInput;
use crate::utf8::Sse42Utf8;

/// Class bits produced by the nibble lookup: a byte belongs to a class when
/// the AND of its low-nibble and high-nibble table entries has the class
/// bit set.
///
/// 0x01 braces and brackets, 0x02 comma, 0x04 colon, 0x08 control
/// whitespace, 0x10 space. Operators test against 0x07, whitespace against
/// 0x18.
const LOW_NIBBLE_TABLE: [i8; 16] = [16, 0, 0, 0, 0, 0, 0, 0, 0, 8, 12, 1, 2, 9, 0, 0];
const HIGH_NIBBLE_TABLE: [i8; 16] = [8, 0, 18, 4, 0, 1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0];

const OP_CLASS: i8 = 0x07;
const WHITESPACE_CLASS: i8 = 0x18;

/// One 64-byte window in four SSE registers.
pub(crate) struct Sse42Input {
    v0: __m128i,
    v1: __m128i,
    v2: __m128i,
    v3: __m128i,
}

/// Compose the sign bits of four 16-byte registers into one 64-bit mask.
#[inline]
unsafe fn combine(m0: __m128i, m1: __m128i, m2: __m128i, m3: __m128i) -> u64 {
    // SAFETY: SSE2 subset of the backend's requirements.
    unsafe {
        let b0 = _mm_movemask_epi8(m0) as u64;
        let b1 = _mm_movemask_epi8(m1) as u64;
        let b2 = _mm_movemask_epi8(m2) as u64;
        let b3 = _mm_movemask_epi8(m3) as u64;
        b0 | (b1 << 16) | (b2 << 32) | (b3 << 48)
    }
}

/// Bytes of `v` at or below `bound`, compared unsigned: raising a byte to
/// `bound` with the unsigned max changes nothing exactly when the byte does
/// not exceed it.
#[inline]
unsafe fn below_or_equal(v: __m128i, bound: __m128i) -> __m128i {
    // SAFETY: SSE2 subset of the backend's requirements.
    unsafe { _mm_cmpeq_epi8(_mm_max_epu8(v, bound), bound) }
}

/// Class byte of each input byte: the AND of the two nibble lookups.
#[inline]
unsafe fn classify(v: __m128i) -> __m128i {
    // SAFETY: requires SSSE3 for the shuffles, implied by SSE4.2.
    unsafe {
        let low_table = _mm_loadu_si128(LOW_NIBBLE_TABLE.as_ptr() as *const __m128i);
        let high_table = _mm_loadu_si128(HIGH_NIBBLE_TABLE.as_ptr() as *const __m128i);
        let nibble_mask = _mm_set1_epi8(0x0F);
        let low = _mm_and_si128(v, nibble_mask);
        let high = _mm_and_si128(_mm_srli_epi16::<4>(v), nibble_mask);
        _mm_and_si128(
            _mm_shuffle_epi8(low_table, low),
            _mm_shuffle_epi8(high_table, high),
        )
    }
}

/// Bytes whose class byte has any bit of `class` set.
#[inline]
unsafe fn in_class(classes: __m128i, class: i8) -> __m128i {
    // Class values stay below 0x20, so a signed greater-than against zero
    // is an any-bit-set test.
    // SAFETY: SSE2 subset of the backend's requirements.
    unsafe {
        _mm_cmpgt_epi8(
            _mm_and_si128(classes, _mm_set1_epi8(class)),
            _mm_setzero_si128(),
        )
    }
}

impl SimdInput for Sse42Input {
    type Validator = Sse42Utf8;

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
        // SAFETY: the dispatcher selects this backend only on SSE4.2
        // hardware.
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
        // SAFETY: see `eq`.
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
        // SAFETY: see `eq`.
        unsafe {
            let c0 = classify(self.v0);
            let c1 = classify(self.v1);
            let c2 = classify(self.v2);
            let c3 = classify(self.v3);
            let whitespace = combine(
                in_class(c0, WHITESPACE_CLASS),
                in_class(c1, WHITESPACE_CLASS),
                in_class(c2, WHITESPACE_CLASS),
                in_class(c3, WHITESPACE_CLASS),
            );
            let op = combine(
                in_class(c0, OP_CLASS),
                in_class(c1, OP_CLASS),
                in_class(c2, OP_CLASS),
                in_class(c3, OP_CLASS),
            );
            (whitespace, op)
        }
    }

    #[inline]
    fn quote_mask(quotes: u64) -> u64 {
        prefix_xor(quotes)
    }
}

/// Build the structural index of `json` using the SSE4.2 backend.
pub fn build_structural_index(json: &[u8], index: &mut StructuralIndex) -> Result<(), ScanError> {
    // SAFETY: Caller must ensure SSE4.2 is available.
    unsafe { build_sse42(json, index) }
}

#[target_feature(enable = "sse4.2")]
unsafe fn build_sse42(json: &[u8], index: &mut StructuralIndex) -> Result<(), ScanError> {
    // SAFETY: instruction-set support is established by the wrapper.
    unsafe { scan_document::<Sse42Input>(json, index) }
}
