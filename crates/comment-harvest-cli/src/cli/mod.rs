//! Command implementations for the `comment-harvest` binary.

pub mod capture_cmd;
pub mod parse_cmd;
