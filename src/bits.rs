//! 64-bit carry arithmetic shared by every backend.
//!
//! Each helper consumes one 64-byte window's worth of mask bits and a carry
//! from the prior window, so runs of matching bytes are tracked correctly
//! across window boundaries.

/// Bits at even positions within a 64-bit word.
const EVEN_BITS: u64 = 0x5555_5555_5555_5555;

/// Mask of bits that sit immediately after an odd-length run of set bits in
/// `matches`.
///
/// An odd-length run of backslashes escapes the character that follows it;
/// an even-length run, and the largest even-length prefix of an odd run,
/// only escape backslashes. Runs are classified by where their carry exits
/// the run after adding a bit at the run's start: a run starting on an even
/// bit position ends its carry on an odd position exactly when its length is
/// odd, and vice versa.
///
/// `overflow` carries two facts between windows: on entry, whether the prior
/// window ended on an odd-length run (which flips the even/odd sense of the
/// first start edge); on exit, whether this window does.
#[inline]
pub(crate) fn follows_odd_sequence_of(matches: u64, overflow: &mut u64) -> u64 {
    let start_edges = matches & !(matches << 1);
    // flip lowest if we have an odd-length run at the end of the prior window
    let even_start_mask = EVEN_BITS ^ *overflow;
    let even_starts = start_edges & even_start_mask;
    let odd_starts = start_edges & !even_start_mask;
    let even_carries = matches.wrapping_add(even_starts);

    // the carry-out of bit 63 flips the sense of the first edge of the next
    // window
    let (mut odd_carries, ends_on_odd) = matches.overflowing_add(odd_starts);
    // bit zero is a potential run end if the prior window ended on an odd run
    odd_carries |= *overflow;
    *overflow = u64::from(ends_on_odd);

    let even_carry_ends = even_carries & !matches;
    let odd_carry_ends = odd_carries & !matches;
    (even_carry_ends & !EVEN_BITS) | (odd_carry_ends & EVEN_BITS)
}

/// Mask of bits that sit immediately after a set bit in `matches`, carrying
/// the top bit into the next window.
#[inline]
pub(crate) fn follows(matches: u64, overflow: &mut u64) -> u64 {
    let result = (matches << 1) | *overflow;
    *overflow = matches >> 63;
    result
}

/// Prefix-XOR over the bits of `mask`: bit `i` of the result is set iff an
/// odd number of bits at positions at or below `i` are set.
///
/// Software replacement for a carryless multiply by all-ones, used by the
/// backends without a CLMUL instruction.
#[inline]
pub(crate) fn prefix_xor(mask: u64) -> u64 {
    let mut result = mask;
    result ^= result << 1;
    result ^= result << 2;
    result ^= result << 4;
    result ^= result << 8;
    result ^= result << 16;
    result ^= result << 32;
    result
}
