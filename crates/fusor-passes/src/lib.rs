//! # fusor-passes
//!
//! Idiom-recognition and rewrite passes over the fusor IR.
//!
//! The flagship pass recognizes the four-byte sum-of-absolute-differences
//! idiom — four per-byte `|a_i - b_i|` terms of two common 32-bit words,
//! summed with an optional accumulator — and fuses it into a single
//! primitive call when the target provides one. See [`sad::fuse_sad`].

pub mod config;
pub mod sad;

pub use config::TargetConfig;
pub use sad::fuse_sad;
