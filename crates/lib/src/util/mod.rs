//! Shared utilities.
//!
//! Lexical path helpers and test support.

pub mod path;

#[cfg(test)]
pub mod testutil;
