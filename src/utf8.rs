//! Incremental UTF-8 validation over 64-byte windows.
//!
//! The SIMD backends wrap the chunked validators from `simdutf8`; the SSE2
//! baseline and the scalar backend use an incremental validator that carries
//! a split code point between windows. Validators hold no state across
//! scans and never report errors on ASCII input.

use crate::ScanError;

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
use simdutf8::basic::imp::ChunkedUtf8Validator;

/// Streaming UTF-8 validation fed in whole 64-byte windows, with the
/// verdict collected once at end of stream.
pub(crate) trait Utf8Validator {
    /// # Safety
    ///
    /// The caller must guarantee CPU support for the implementation's
    /// instruction set.
    unsafe fn new() -> Self;

    /// Feed the next 64-byte window.
    fn check_next_input(&mut self, window: &[u8]);

    /// The verdict for everything fed so far.
    fn errors(self) -> Result<(), ScanError>;
}

#[cfg(target_arch = "x86_64")]
pub(crate) struct Avx2Utf8 {
    inner: simdutf8::basic::imp::x86::avx2::ChunkedUtf8ValidatorImp,
}

#[cfg(target_arch = "x86_64")]
impl Utf8Validator for Avx2Utf8 {
    unsafe fn new() -> Self {
        // SAFETY: the dispatcher selects this validator only on AVX2
        // hardware.
        let inner = unsafe { simdutf8::basic::imp::x86::avx2::ChunkedUtf8ValidatorImp::new() };
        Self { inner }
    }

    #[inline]
    fn check_next_input(&mut self, window: &[u8]) {
        debug_assert_eq!(window.len(), 64);
        // SAFETY: window is exactly 64 bytes, as required by update_from_chunks.
        unsafe { self.inner.update_from_chunks(window) };
    }

    fn errors(self) -> Result<(), ScanError> {
        // SAFETY: all input fed via check_next_input was 64-byte windows.
        unsafe { self.inner.finalize(None) }.map_err(|_| ScanError::InvalidUtf8)
    }
}

#[cfg(target_arch = "x86_64")]
pub(crate) struct Sse42Utf8 {
    inner: simdutf8::basic::imp::x86::sse42::ChunkedUtf8ValidatorImp,
}

#[cfg(target_arch = "x86_64")]
impl Utf8Validator for Sse42Utf8 {
    unsafe fn new() -> Self {
        // SAFETY: the dispatcher selects this validator only on SSE4.2
        // hardware.
        let inner = unsafe { simdutf8::basic::imp::x86::sse42::ChunkedUtf8ValidatorImp::new() };
        Self { inner }
    }

    #[inline]
    fn check_next_input(&mut self, window: &[u8]) {
        debug_assert_eq!(window.len(), 64);
        // SAFETY: window is exactly 64 bytes, as required by update_from_chunks.
        unsafe { self.inner.update_from_chunks(window) };
    }

    fn errors(self) -> Result<(), ScanError> {
        // SAFETY: all input fed via check_next_input was 64-byte windows.
        unsafe { self.inner.finalize(None) }.map_err(|_| ScanError::InvalidUtf8)
    }
}

#[cfg(target_arch = "aarch64")]
pub(crate) struct NeonUtf8 {
    inner: simdutf8::basic::imp::aarch64::neon::ChunkedUtf8ValidatorImp,
}

#[cfg(target_arch = "aarch64")]
impl Utf8Validator for NeonUtf8 {
    unsafe fn new() -> Self {
        // SAFETY: NEON is mandatory on aarch64.
        let inner = unsafe { simdutf8::basic::imp::aarch64::neon::ChunkedUtf8ValidatorImp::new() };
        Self { inner }
    }

    #[inline]
    fn check_next_input(&mut self, window: &[u8]) {
        debug_assert_eq!(window.len(), 64);
        // SAFETY: window is exactly 64 bytes, as required by update_from_chunks.
        unsafe { self.inner.update_from_chunks(window) };
    }

    fn errors(self) -> Result<(), ScanError> {
        // SAFETY: all input fed via check_next_input was 64-byte windows.
        unsafe { self.inner.finalize(None) }.map_err(|_| ScanError::InvalidUtf8)
    }
}

/// Incremental scalar validator carrying at most three pending bytes of a
/// code point split across a window boundary.
#[derive(Default)]
pub(crate) struct ScalarUtf8 {
    pending: [u8; 4],
    pending_len: usize,
    failed: bool,
}

impl Utf8Validator for ScalarUtf8 {
    unsafe fn new() -> Self {
        Self::default()
    }

    fn check_next_input(&mut self, window: &[u8]) {
        debug_assert_eq!(window.len(), 64);
        if self.failed {
            return;
        }
        let mut buf = [0u8; 68];
        let pending = self.pending_len;
        buf[..pending].copy_from_slice(&self.pending[..pending]);
        buf[pending..pending + window.len()].copy_from_slice(window);
        let total = pending + window.len();

        match core::str::from_utf8(&buf[..total]) {
            Ok(_) => self.pending_len = 0,
            Err(err) => match err.error_len() {
                Some(_) => self.failed = true,
                None => {
                    // A code point split across the window boundary; at most
                    // three bytes of a four-byte sequence can be pending.
                    let tail = total - err.valid_up_to();
                    self.pending[..tail].copy_from_slice(&buf[err.valid_up_to()..total]);
                    self.pending_len = tail;
                }
            },
        }
    }

    fn errors(self) -> Result<(), ScanError> {
        if self.failed || self.pending_len > 0 {
            Err(ScanError::InvalidUtf8)
        } else {
            Ok(())
        }
    }
}
