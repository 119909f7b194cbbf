#![deny(missing_docs)]

//! Summary vector indexing.
//!
//! A summary case splits into a *specification* file, describing every
//! available time-series vector once, and *data* files holding one
//! fixed-layout value vector per time step. This crate builds the
//! compound-key index over the specification ([`SummarySpec`], one
//! [`SummaryNode`] per vector) and resolves keys plus temporal
//! selectors against the data ([`SummarySeries`]):
//!
//! ```text
//! "WOPR:OP_1"   per-well oil production rate
//! "BPR:12,4,2"  pressure in cell (12, 4, 2)
//! "RPR:3"       pressure in region 3
//! ```

pub use keys::*;
pub use node::*;
pub use series::*;
pub use spec::*;

mod keys;
mod node;
mod series;
mod spec;
