//! JSON encoding for the files in the data directory.
//!
//! Output is pretty-printed with 2-space indentation and a trailing newline.

mod json;

pub use json::*;
