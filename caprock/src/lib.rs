//! Umbrella crate re-exporting the caprock reader/writer stack for
//! reservoir-simulation result files.
//!
//! The record layer ([`Record`], [`Block`], [`RecordStream`]) is
//! re-exported at the top level; whole-file aggregation lives under
//! [`file`] and summary-vector indexing under [`summary`].

pub use caprock_records::*;
pub use {caprock_error as error, caprock_file as file, caprock_summary as summary};
