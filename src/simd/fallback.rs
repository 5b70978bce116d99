//! Scalar backend for architectures without SIMD support.
//!
//! Builds the 64-bit window masks byte by byte. Slower than the vector
//! backends but the external contract is identical, which also makes it the
//! comparison baseline in the SIMD backends' tests.

use crate::ScanError;
use crate::bits::prefix_xor;
use crate::index::StructuralIndex;
use crate::scan::scan_document;
use crate::simd::SimdInput;
use crate::utf8::ScalarUtf8;

/// One 64-byte window held as plain bytes.
pub(crate) struct ScalarInput {
    bytes: [u8; 64],
}

impl SimdInput for ScalarInput {
    type Validator = ScalarUtf8;

    #[inline]
    unsafe fn new(chunk: &[u8]) -> Self {
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&chunk[..64]);
        Self { bytes }
    }

    #[inline]
    fn eq(&self, byte: u8) -> u64 {
        let mut mask = 0u64;
        for (i, &b) in self.bytes.iter().enumerate() {
            if b == byte {
                mask |= 1 << i;
            }
        }
        mask
    }

    #[inline]
    fn lteq(&self, byte: u8) -> u64 {
        let mut mask = 0u64;
        for (i, &b) in self.bytes.iter().enumerate() {
            if b <= byte {
                mask |= 1 << i;
            }
        }
        mask
    }

    #[inline]
    fn whitespace_and_operators(&self) -> (u64, u64) {
        let mut whitespace = 0u64;
        let mut op = 0u64;
        for (i, &b) in self.bytes.iter().enumerate() {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' => whitespace |= 1 << i,
                b'{' | b'}' | b'[' | b']' | b':' | b',' => op |= 1 << i,
                _ => {}
            }
        }
        (whitespace, op)
    }

    #[inline]
    fn quote_mask(quotes: u64) -> u64 {
        prefix_xor(quotes)
    }
}

/// Build the structural index of `json` using the scalar backend.
pub fn build_structural_index(json: &[u8], index: &mut StructuralIndex) -> Result<(), ScanError> {
    // SAFETY: the scalar backend has no instruction-set requirements.
    unsafe { scan_document::<ScalarInput>(json, index) }
}
