//! Scanner driver: string tracking, structural detection, index flattening.
//!
//! The driver walks the document in 128-byte steps of two 64-byte SIMD
//! windows each, threading all cross-window state through an explicit
//! [`ScannerState`]. Structurals of a window are deliberately held for one
//! step and flattened while the next window's quote mask is still in
//! flight, so the final flatten after the loop must run after the last
//! computed window.

use crate::ScanError;
use crate::bits::{follows, follows_odd_sequence_of};
use crate::index::StructuralIndex;
use crate::simd::SimdInput;
use crate::utf8::Utf8Validator;

/// Bytes consumed per driver iteration: two 64-byte SIMD windows.
pub(crate) const STEP_SIZE: usize = 128;

/// Carry state threaded across the 128-byte iterations of one scan.
#[derive(Default)]
struct ScannerState {
    /// Whether the first byte of the next window continues an odd-length
    /// backslash run.
    prev_escaped: u64,
    /// All-ones while the last byte of the prior window was inside a string,
    /// all-zeros otherwise.
    prev_in_string: u64,
    /// Whether the last byte of the prior window was a primitive byte.
    prev_primitive: u64,
    /// Structurals of the prior window, held one step so flattening them
    /// overlaps the next window's quote-mask computation.
    structurals: u64,
    /// Accumulated control bytes observed inside strings.
    unescaped_chars_error: u64,
}

/// Mask of string characters plus end quotes for one window.
///
/// The XOR with the quote bits turns the opening quote off and the closing
/// quote on, so the mask covers a contiguous span while the opening quote
/// stays visible to the primitive detector.
#[inline]
fn find_strings<S: SimdInput>(input: &S, state: &mut ScannerState) -> u64 {
    let backslash = input.eq(b'\\');
    let escaped = follows_odd_sequence_of(backslash, &mut state.prev_escaped);
    let quote = input.eq(b'"') & !escaped;
    let in_string = S::quote_mask(quote) ^ state.prev_in_string;
    // sign-extend bit 63: all-ones while a string spans into the next window
    state.prev_in_string = ((in_string as i64) >> 63) as u64;
    in_string ^ quote
}

/// Operators plus primitive-run starts for one window, before string
/// masking.
///
/// String contents are classified the same as content outside strings; the
/// driver removes the false positives once the string mask is known.
#[inline]
fn find_potential_structurals<S: SimdInput>(input: &S, state: &mut ScannerState) -> u64 {
    let (whitespace, op) = input.whitespace_and_operators();
    let primitive = !(op | whitespace);
    let follows_primitive = follows(primitive, &mut state.prev_primitive);
    let start_primitive = primitive & !follows_primitive;
    op | start_primitive
}

/// EOF checks that cannot be detected window-locally.
#[inline]
fn detect_errors_on_eof(state: &ScannerState) -> Result<(), ScanError> {
    if state.prev_in_string != 0 {
        return Err(ScanError::UnclosedString);
    }
    if state.unescaped_chars_error != 0 {
        return Err(ScanError::UnescapedChars);
    }
    Ok(())
}

/// Writes flattened offsets into the index slots.
struct IndexWriter<'a> {
    slots: &'a mut [u32],
    count: usize,
}

impl IndexWriter<'_> {
    /// Append the absolute offset of every set bit of `bits`, where `bits`
    /// describes the 64-byte window that ended at `idx`.
    ///
    /// Offsets are written unconditionally in groups of eight and the count
    /// advances by the popcount, so slots past the last set bit may hold
    /// garbage that a later flatten or the terminator overwrites.
    #[inline]
    fn flatten(&mut self, idx: usize, mut bits: u64) {
        if bits == 0 {
            return;
        }
        let cnt = bits.count_ones() as usize;
        let base = (idx - 64) as u32;
        debug_assert!(self.count + cnt + 7 < self.slots.len());
        // SAFETY: `StructuralIndex` allocates one slot per input byte plus
        // terminator, sentinel and seven slots of group slack, and the
        // driver rejects inputs longer than the declared capacity, so every
        // write below lands inside `slots`.
        unsafe {
            for i in 0..8 {
                *self.slots.get_unchecked_mut(self.count + i) = base + bits.trailing_zeros();
                bits &= bits.wrapping_sub(1);
            }
            if cnt > 8 {
                for i in 8..16 {
                    *self.slots.get_unchecked_mut(self.count + i) = base + bits.trailing_zeros();
                    bits &= bits.wrapping_sub(1);
                }
                if cnt > 16 {
                    for i in 16..cnt {
                        *self.slots.get_unchecked_mut(self.count + i) =
                            base + bits.trailing_zeros();
                        bits &= bits.wrapping_sub(1);
                    }
                }
            }
        }
        self.count += cnt;
    }
}

/// One 128-byte step: scan two windows, flatten the lagged structurals.
///
/// # Safety
///
/// The caller must guarantee CPU support for `S` and at least `STEP_SIZE`
/// readable bytes at `chunk`.
#[inline]
unsafe fn scan_step<S: SimdInput>(
    chunk: &[u8],
    idx: usize,
    writer: &mut IndexWriter<'_>,
    state: &mut ScannerState,
    utf8: &mut S::Validator,
) {
    debug_assert!(chunk.len() >= STEP_SIZE);
    // SAFETY: instruction-set support and chunk length are guaranteed by the
    // caller.
    let (input_1, input_2) = unsafe { (S::new(&chunk[..64]), S::new(&chunk[64..128])) };

    // The string tracker and the primitive detector share carry bits, so
    // the order of these four calls is fixed.
    let string_1 = find_strings(&input_1, state);
    let structurals_1 = find_potential_structurals(&input_1, state);
    let string_2 = find_strings(&input_2, state);
    let structurals_2 = find_potential_structurals(&input_2, state);

    // Flatten the previous window's structurals and run the UTF-8 check
    // while the quote masks above are still being computed.
    let unescaped_1 = input_1.lteq(0x1F);
    utf8.check_next_input(&chunk[..64]);
    writer.flatten(idx, state.structurals);
    state.structurals = structurals_1 & !string_1;
    state.unescaped_chars_error |= unescaped_1 & string_1;

    let unescaped_2 = input_2.lteq(0x1F);
    utf8.check_next_input(&chunk[64..128]);
    writer.flatten(idx + 64, state.structurals);
    state.structurals = structurals_2 & !string_2;
    state.unescaped_chars_error |= unescaped_2 & string_2;
}

/// Scan a whole document, writing structural offsets into `index`.
///
/// # Safety
///
/// The caller must guarantee that the CPU supports the instruction sets of
/// `S` and its UTF-8 validator.
pub(crate) unsafe fn scan_document<S: SimdInput>(
    json: &[u8],
    index: &mut StructuralIndex,
) -> Result<(), ScanError> {
    let len = json.len();
    if len > index.byte_capacity() {
        return Err(ScanError::Capacity);
    }
    // SAFETY: instruction-set support is guaranteed by the caller.
    let mut utf8 = unsafe { <S::Validator as Utf8Validator>::new() };
    let mut state = ScannerState::default();
    let mut writer = IndexWriter {
        slots: index.slots_mut(),
        count: 0,
    };

    let len_minus_step = len.saturating_sub(STEP_SIZE);
    let mut idx = 0;
    while idx < len_minus_step {
        // SAFETY: `idx + STEP_SIZE <= len`, so the chunk holds a full step.
        unsafe { scan_step::<S>(&json[idx..], idx, &mut writer, &mut state, &mut utf8) };
        idx += STEP_SIZE;
    }

    // Pad the tail to a whole step with spaces. A space is inert for every
    // classifier and keeps the UTF-8 windows well-formed.
    if idx < len {
        let mut tail = [b' '; STEP_SIZE];
        tail[..len - idx].copy_from_slice(&json[idx..]);
        // SAFETY: `tail` is a full step.
        unsafe { scan_step::<S>(&tail, idx, &mut writer, &mut state, &mut utf8) };
        idx += STEP_SIZE;
    }

    // The lagged structurals of the last computed window.
    writer.flatten(idx, state.structurals);
    let mut n = writer.count;

    detect_errors_on_eof(&state)?;

    if n == 0 {
        return Err(ScanError::Empty);
    }
    let slots = index.slots_mut();
    let last = slots[n - 1] as usize;
    if last > len {
        return Err(ScanError::Unexpected);
    }
    if last != len {
        // The input need not end on a structural; append a virtual
        // terminator so stage 2 always sees the document length.
        slots[n] = len as u32;
        n += 1;
    }
    // Make it safe to dereference one slot beyond the counted entries.
    slots[n] = 0;
    index.set_len(n);

    utf8.errors()
}
