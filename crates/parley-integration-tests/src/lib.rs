//! Integration test crate for Parley.
//!
//! This crate exists solely to run end-to-end negotiations across the Parley crates.
//! It has no public API - all functionality is in the test modules.

#![forbid(unsafe_code)]
