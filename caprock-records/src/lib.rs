#![deny(missing_docs)]

//! Keyword records and report-step blocks.
//!
//! Simulation-result files are flat sequences of *records*: named, typed,
//! fixed-layout arrays. This crate implements the record layer:
//!
//! 1. [`DataType`], the fixed element-type enumeration shared by every
//!    record.
//! 2. [`RecordStream`], the positioned read/write contract over one
//!    file, with interchangeable unformatted ([`BinaryStream`]) and
//!    formatted ([`FormattedStream`]) codecs.
//! 3. [`Record`], an in-memory record, and [`LazyRecord`], a header
//!    handle that defers payload deserialization until first use.
//! 4. [`Block`], an ordered, uniquely-named group of records making up
//!    one report step or file segment.

pub use block::*;
pub use datatype::*;
pub use lazy::*;
pub use record::*;
pub use stream::*;

mod block;
mod datatype;
mod lazy;
mod record;
mod stream;
