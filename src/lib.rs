//! # Briskly
//!
//! SIMD-accelerated JSON structural indexing for Rust.
//!
//! This crate implements the first stage of a high-throughput JSON parser:
//! it scans raw UTF-8 bytes and produces the ordered list of byte offsets of
//! every structural character (`{` `}` `[` `]` `:` `,`) and every first byte
//! of a primitive run, with string contents masked out and UTF-8 validated
//! along the way. A tape-building second stage can consume the index without
//! ever re-scanning the document.
//!
//! The vectorized scanning techniques are influenced by:
//! - Langdale & Lemire, ["Parsing Gigabytes of JSON per Second"](https://arxiv.org/abs/1902.08318) (2019)
//!
//! ## Quick Start
//!
//! ```
//! use briskly::StructuralIndex;
//!
//! let index = StructuralIndex::build(br#"{"a":1}"#).unwrap();
//!
//! // Offsets of `{`, `"`, `:`, `1`, `}`, plus the end-of-input terminator.
//! assert_eq!(index.offsets(), &[0, 1, 4, 5, 6, 7]);
//! ```
//!
//! ## Backends
//!
//! The scanner is architecture-neutral over a small SIMD interface with one
//! backend per instruction set:
//!
//! - x86_64: SSE2 (baseline), SSE4.2, AVX2 (with carryless-multiply quote
//!   masks), selected at runtime
//! - aarch64: NEON
//! - everything else: a scalar fallback with the same external contract
//!
//! ## Features
//!
//! - `std` (default) - runtime CPU feature detection and `std::error::Error`
//! - `serde` - serialization support for the error type
//! - `cli` - the `briskly` benchmark harness binary

// Use no_std unless std feature is enabled or we're in test mode
#![cfg_attr(not(any(test, feature = "std")), no_std)]

// When using no_std, we need to explicitly link the alloc crate
#[cfg(not(any(test, feature = "std")))]
extern crate alloc;

// When using std, re-export alloc types from std for compatibility
#[cfg(any(test, feature = "std"))]
extern crate std as alloc;

mod bits;
mod error;
mod index;
mod scan;
pub mod simd;
mod utf8;

pub use error::ScanError;
pub use index::StructuralIndex;
pub use simd::build_structural_index;
