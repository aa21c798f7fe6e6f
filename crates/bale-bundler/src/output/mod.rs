//! Bundle output.

pub mod writer;

pub use writer::write_bundles_to;
