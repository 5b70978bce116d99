//! AVX2 backend for x86_64.
//!
//! Holds a 64-byte window in two 32-byte registers, classifies whitespace
//! and operators with a two-table nibble shuffle, and computes the quote
//! mask with a carryless multiply against all-ones. Requires AVX2 and
//! PCLMULQDQ, available together on Intel Haswell (2013+) and AMD Excavator
//! (2015+).

use core::arch::x86_64::*;

use crate::ScanError;
use crate::index::StructuralIndex;
use crate::scan::scan_document;
use crate::simd::SimdInput;
use crate::utf8::Avx2Utf8;

/// Class bits produced by the nibble lookup, repeated per 128-bit lane of
/// the shuffle: 0x01 braces and brackets, 0x02 comma, 0x04 colon, 0x08
/// control whitespace, 0x10 space. Operators test against 0x07, whitespace
/// against 0x18.
#[rustfmt::skip]
const LOW_NIBBLE_TABLE: [i8; 32] = [
    16, 0, 0, 0, 0, 0, 0, 0, 0, 8, 12, 1, 2, 9, 0, 0,
    16, 0, 0, 0, 0, 0, 0, 0, 0, 8, 12, 1, 2, 9, 0, 0,
];
#[rustfmt::skip]
const HIGH_NIBBLE_TABLE: [i8; 32] = [
    8, 0, 18, 4, 0, 1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0,
    8, 0, 18, 4, 0, 1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0,
];

const OP_CLASS: i8 = 0x07;
const WHITESPACE_CLASS: i8 = 0x18;

/// One 64-byte window in two AVX2 registers.
pub(crate) struct Avx2Input {
    v0: __m256i,
    v1: __m256i,
}

/// Compose the sign bits of two 32-byte registers into one 64-bit mask.
#[inline]
unsafe fn combine(m0: __m256i, m1: __m256i) -> u64 {
    // SAFETY: the dispatcher selects this backend only on AVX2 hardware.
    unsafe {
        let b0 = _mm256_movemask_epi8(m0) as u32 as u64;
        let b1 = _mm256_movemask_epi8(m1) as u32 as u64;
        b0 | (b1 << 32)
    }
}

/// Bytes of `v` at or below `bound`, compared unsigned: raising a byte to
/// `bound` with the unsigned max changes nothing exactly when the byte does
/// not exceed it.
#[inline]
unsafe fn below_or_equal(v: __m256i, bound: __m256i) -> __m256i {
    // SAFETY: AVX2 only.
    unsafe { _mm256_cmpeq_epi8(_mm256_max_epu8(v, bound), bound) }
}

/// Class byte of each input byte: the AND of the two nibble lookups.
#[inline]
unsafe fn classify(v: __m256i) -> __m256i {
    // SAFETY: AVX2 only.
    unsafe {
        let low_table = _mm256_loadu_si256(LOW_NIBBLE_TABLE.as_ptr() as *const __m256i);
        let high_table = _mm256_loadu_si256(HIGH_NIBBLE_TABLE.as_ptr() as *const __m256i);
        let nibble_mask = _mm256_set1_epi8(0x0F);
        let low = _mm256_and_si256(v, nibble_mask);
        let high = _mm256_and_si256(_mm256_srli_epi16::<4>(v), nibble_mask);
        _mm256_and_si256(
            _mm256_shuffle_epi8(low_table, low),
            _mm256_shuffle_epi8(high_table, high),
        )
    }
}

/// Bytes whose class byte has any bit of `class` set.
#[inline]
unsafe fn in_class(classes: __m256i, class: i8) -> __m256i {
    // Class values stay below 0x20, so a signed greater-than against zero
    // is an any-bit-set test.
    // SAFETY: AVX2 only.
    unsafe {
        _mm256_cmpgt_epi8(
            _mm256_and_si256(classes, _mm256_set1_epi8(class)),
            _mm256_setzero_si256(),
        )
    }
}

impl SimdInput for Avx2Input {
    type Validator = Avx2Utf8;

    #[inline]
    unsafe fn new(chunk: &[u8]) -> Self {
        debug_assert!(chunk.len() >= 64);
        // SAFETY: the caller guarantees 64 readable bytes; loads are
        // unaligned.
        unsafe {
            Self {
                v0: _mm256_loadu_si256(chunk.as_ptr() as *const __m256i),
                v1: _mm256_loadu_si256(chunk.as_ptr().add(32) as *const __m256i),
            }
        }
    }

    #[inline]
    fn eq(&self, byte: u8) -> u64 {
        // SAFETY: the dispatcher selects this backend only on AVX2
        // hardware.
        unsafe {
            let splat = _mm256_set1_epi8(byte as i8);
            combine(
                _mm256_cmpeq_epi8(self.v0, splat),
                _mm256_cmpeq_epi8(self.v1, splat),
            )
        }
    }

    #[inline]
    fn lteq(&self, byte: u8) -> u64 {
        // SAFETY: see `eq`.
        unsafe {
            let bound = _mm256_set1_epi8(byte as i8);
            combine(
                below_or_equal(self.v0, bound),
                below_or_equal(self.v1, bound),
            )
        }
    }

    #[inline]
    fn whitespace_and_operators(&self) -> (u64, u64) {
        // SAFETY: see `eq`.
        unsafe {
            let c0 = classify(self.v0);
            let c1 = classify(self.v1);
            let whitespace = combine(
                in_class(c0, WHITESPACE_CLASS),
                in_class(c1, WHITESPACE_CLASS),
            );
            let op = combine(in_class(c0, OP_CLASS), in_class(c1, OP_CLASS));
            (whitespace, op)
        }
    }

    #[inline]
    fn quote_mask(quotes: u64) -> u64 {
        // A carryless multiply by all-ones is a prefix-XOR over the bits.
        // SAFETY: the dispatcher selects this backend only when PCLMULQDQ
        // is available.
        unsafe {
            let product = _mm_clmulepi64_si128::<0>(
                _mm_set_epi64x(0, quotes as i64),
                _mm_set1_epi8(-1),
            );
            _mm_cvtsi128_si64(product) as u64
        }
    }
}

/// Build the structural index of `json` using the AVX2 backend.
pub fn build_structural_index(json: &[u8], index: &mut StructuralIndex) -> Result<(), ScanError> {
    // SAFETY: Caller must ensure AVX2 and PCLMULQDQ are available.
    unsafe { build_avx2(json, index) }
}

#[target_feature(enable = "avx2,pclmulqdq")]
unsafe fn build_avx2(json: &[u8], index: &mut StructuralIndex) -> Result<(), ScanError> {
    // SAFETY: instruction-set support is established by the wrapper.
    unsafe { scan_document::<Avx2Input>(json, index) }
}
