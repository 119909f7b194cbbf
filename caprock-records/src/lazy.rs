use std::sync::Arc;

use caprock_error::{CaprockResult, caprock_bail};

use crate::{Record, RecordHeader, RecordStream};

/// A record whose payload stays on disk until first use.
///
/// A `LazyRecord` holds the header metadata and the byte offset of the
/// record body; [`LazyRecord::materialize`] performs the deferred read
/// and caches the result, so repeated access costs one read total. The
/// handle stays valid across [`LazyRecord::invalidate`], which drops
/// the cache but keeps the location.
#[derive(Debug, Clone)]
pub struct LazyRecord {
    header: RecordHeader,
    /// Offset of the record start, header frame included.
    offset: u64,
    cached: Option<Arc<Record>>,
}

impl LazyRecord {
    /// Declare a record at a known stream offset without reading its
    /// payload.
    pub fn new(header: RecordHeader, offset: u64) -> Self {
        LazyRecord {
            header,
            offset,
            cached: None,
        }
    }

    /// Wrap an already loaded record, noting the offset it was read
    /// from.
    pub fn new_loaded(record: Record, offset: u64) -> Self {
        LazyRecord {
            header: record.header(),
            offset,
            cached: Some(Arc::new(record)),
        }
    }

    /// The record header, available without touching the stream.
    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// The byte offset of the record in its stream.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether the payload is currently cached in memory.
    pub fn is_loaded(&self) -> bool {
        self.cached.is_some()
    }

    /// Load the payload, reading from `stream` on first use. The record
    /// found at the stored offset must carry the declared name, type
    /// and count; a disagreement means the file changed underneath us.
    pub fn materialize(&mut self, stream: &mut dyn RecordStream) -> CaprockResult<Arc<Record>> {
        if let Some(record) = &self.cached {
            return Ok(Arc::clone(record));
        }

        stream.seek(self.offset)?;
        let Some(record) = Record::read_from(stream)? else {
            caprock_bail!(
                UnexpectedEof: "no record at offset {} where {} was declared",
                self.offset,
                self.header
            );
        };
        if record.header() != self.header {
            caprock_bail!(
                SchemaMismatch: "record at offset {} is {}, expected {}",
                self.offset,
                record.header(),
                self.header
            );
        }
        let record = Arc::new(record);
        self.cached = Some(Arc::clone(&record));
        Ok(record)
    }

    /// Drop the cached payload. The next [`LazyRecord::materialize`]
    /// reads from the stream again.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Copy the record to another stream: materialize from `src`, then
    /// write at `target`'s current position.
    pub fn write_through(
        &mut self,
        src: &mut dyn RecordStream,
        target: &mut dyn RecordStream,
    ) -> CaprockResult<()> {
        let record = self.materialize(src)?;
        record.write_to(target)
    }

    /// Overwrite the record in place. The replacement must carry the
    /// same type and element count so the on-disk framing keeps its
    /// size; the name may differ.
    pub fn replace(
        &mut self,
        stream: &mut dyn RecordStream,
        record: Record,
    ) -> CaprockResult<()> {
        if record.data_type() != self.header.data_type || record.len() != self.header.count {
            caprock_bail!(
                SchemaMismatch: "cannot replace {} with {}: in-place rewrite requires identical type and count",
                self.header,
                record.header()
            );
        }
        stream.seek(self.offset)?;
        record.write_to(stream)?;
        self.header = record.header();
        self.cached = Some(Arc::new(record));
        Ok(())
    }
}

/// Index every record in `stream` from its current position to the end,
/// skipping payloads.
pub fn scan_stream(stream: &mut dyn RecordStream) -> CaprockResult<Vec<LazyRecord>> {
    let mut records = Vec::new();
    loop {
        let offset = stream.offset()?;
        let Some(header) = stream.read_header()? else {
            break;
        };
        stream.skip_payload(header.data_type, header.count)?;
        records.push(LazyRecord::new(header, offset));
    }
    Ok(records)
}
