//! NEON backend for ARM64.
//!
//! Holds a 64-byte window in four 16-byte registers, classifies whitespace
//! and operators with `vqtbl1q_u8` nibble tables, and uses `vmull_p64` for
//! the quote mask when the `aes` target feature is enabled at compile time.
//! NEON is mandatory on all aarch64 processors.

use core::arch::aarch64::*;

use crate::ScanError;
#[cfg(not(target_feature = "aes"))]
use crate::bits::prefix_xor;
use crate::index::StructuralIndex;
use crate::scan::scan_document;
use crate::simd::SimdInput;
use crate::utf8::NeonUtf8;

/// Class bits produced by the nibble lookup: 0x01 braces and brackets,
/// 0x02 comma, 0x04 colon, 0x08 control whitespace, 0x10 space. Operators
/// test against 0x07, whitespace against 0x18.
const LOW_NIBBLE_TABLE: [u8; 16] = [16, 0, 0, 0, 0, 0, 0, 0, 0, 8, 12, 1, 2, 9, 0, 0];
const HIGH_NIBBLE_TABLE: [u8; 16] = [8, 0, 18, 4, 0, 1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0];

const OP_CLASS: u8 = 0x07;
const WHITESPACE_CLASS: u8 = 0x18;

/// One 64-byte window in four NEON registers.
pub(crate) struct NeonInput {
    v0: uint8x16_t,
    v1: uint8x16_t,
    v2: uint8x16_t,
    v3: uint8x16_t,
}

/// Collapse a 16-lane comparison result into a 16-bit mask, one bit per
/// lane. NEON has no movemask instruction; keeping one weight bit per lane
/// and summing each half horizontally rebuilds the mask, because the eight
/// surviving weights within a half are distinct powers of two.
///
/// Lanes must be all-ones or all-zeros, as produced by the NEON compare and
/// test instructions.
#[inline]
unsafe fn lane_bitmask(cmp: uint8x16_t) -> u16 {
    const LANE_BITS: [u8; 16] = [1, 2, 4, 8, 16, 32, 64, 128, 1, 2, 4, 8, 16, 32, 64, 128];
    // SAFETY: NEON is mandatory on aarch64.
    unsafe {
        let weighted = vandq_u8(cmp, vld1q_u8(LANE_BITS.as_ptr()));
        let lower = vaddv_u8(vget_low_u8(weighted)) as u16;
        let upper = vaddv_u8(vget_high_u8(weighted)) as u16;
        lower | (upper << 8)
    }
}

/// Compose four 16-byte comparison results into one 64-bit mask.
#[inline]
unsafe fn combine(m0: uint8x16_t, m1: uint8x16_t, m2: uint8x16_t, m3: uint8x16_t) -> u64 {
    // SAFETY: NEON only.
    unsafe {
        let b0 = lane_bitmask(m0) as u64;
        let b1 = lane_bitmask(m1) as u64;
        let b2 = lane_bitmask(m2) as u64;
        let b3 = lane_bitmask(m3) as u64;
        b0 | (b1 << 16) | (b2 << 32) | (b3 << 48)
    }
}

/// Class byte of each input byte: the AND of the two nibble lookups.
#[inline]
unsafe fn classify(v: uint8x16_t) -> uint8x16_t {
    // SAFETY: NEON only.
    unsafe {
        let low_table = vld1q_u8(LOW_NIBBLE_TABLE.as_ptr());
        let high_table = vld1q_u8(HIGH_NIBBLE_TABLE.as_ptr());
        let low = vandq_u8(v, vdupq_n_u8(0x0F));
        let high = vshrq_n_u8::<4>(v);
        vandq_u8(vqtbl1q_u8(low_table, low), vqtbl1q_u8(high_table, high))
    }
}

impl SimdInput for NeonInput {
    type Validator = NeonUtf8;

    #[inline]
    unsafe fn new(chunk: &[u8]) -> Self {
        debug_assert!(chunk.len() >= 64);
        // SAFETY: the caller guarantees 64 readable bytes.
        unsafe {
            Self {
                v0: vld1q_u8(chunk.as_ptr()),
                v1: vld1q_u8(chunk.as_ptr().add(16)),
                v2: vld1q_u8(chunk.as_ptr().add(32)),
                v3: vld1q_u8(chunk.as_ptr().add(48)),
            }
        }
    }

    #[inline]
    fn eq(&self, byte: u8) -> u64 {
        // SAFETY: NEON is mandatory on aarch64.
        unsafe {
            let splat = vdupq_n_u8(byte);
            combine(
                vceqq_u8(self.v0, splat),
                vceqq_u8(self.v1, splat),
                vceqq_u8(self.v2, splat),
                vceqq_u8(self.v3, splat),
            )
        }
    }

    #[inline]
    fn lteq(&self, byte: u8) -> u64 {
        // SAFETY: NEON only.
        unsafe {
            let splat = vdupq_n_u8(byte);
            combine(
                vcleq_u8(self.v0, splat),
                vcleq_u8(self.v1, splat),
                vcleq_u8(self.v2, splat),
                vcleq_u8(self.v3, splat),
            )
        }
    }

    #[inline]
    fn whitespace_and_operators(&self) -> (u64, u64) {
        // SAFETY: NEON only.
        unsafe {
            let c0 = classify(self.v0);
            let c1 = classify(self.v1);
            let c2 = classify(self.v2);
            let c3 = classify(self.v3);
            let whitespace_splat = vdupq_n_u8(WHITESPACE_CLASS);
            let op_splat = vdupq_n_u8(OP_CLASS);
            let whitespace = combine(
                vtstq_u8(c0, whitespace_splat),
                vtstq_u8(c1, whitespace_splat),
                vtstq_u8(c2, whitespace_splat),
                vtstq_u8(c3, whitespace_splat),
            );
            let op = combine(
                vtstq_u8(c0, op_splat),
                vtstq_u8(c1, op_splat),
                vtstq_u8(c2, op_splat),
                vtstq_u8(c3, op_splat),
            );
            (whitespace, op)
        }
    }

    #[cfg(target_feature = "aes")]
    #[inline]
    fn quote_mask(quotes: u64) -> u64 {
        // A carryless multiply by all-ones is a prefix-XOR over the bits.
        // SAFETY: `vmull_p64` is compiled in only when the `aes` target
        // feature is enabled.
        unsafe { vmull_p64(quotes, u64::MAX) as u64 }
    }

    #[cfg(not(target_feature = "aes"))]
    #[inline]
    fn quote_mask(quotes: u64) -> u64 {
        prefix_xor(quotes)
    }
}

/// Build the structural index of `json` using the NEON backend.
pub fn build_structural_index(json: &[u8], index: &mut StructuralIndex) -> Result<(), ScanError> {
    // SAFETY: NEON is mandatory on all aarch64 processors.
    unsafe { build_neon(json, index) }
}

#[target_feature(enable = "neon")]
unsafe fn build_neon(json: &[u8], index: &mut StructuralIndex) -> Result<(), ScanError> {
    // SAFETY: instruction-set support is established by the wrapper.
    unsafe { scan_document::<NeonInput>(json, index) }
}
