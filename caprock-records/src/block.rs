use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use caprock_error::{CaprockResult, caprock_bail, caprock_err};
use jiff::civil::DateTime;

use crate::{Record, RecordStream};

/// Sentinel record opening a new report step in unified files.
pub const SEQHDR: &str = "SEQHDR";
/// Single-element record carrying the report number of its block.
pub const SEQNUM: &str = "SEQNUM";
/// Marker record present in every well-formed summary ministep.
pub const MINISTEP: &str = "MINISTEP";
/// Integer header record of restart and init files.
pub const INTEHEAD: &str = "INTEHEAD";
/// Per-step value vector of summary data files.
pub const PARAMS: &str = "PARAMS";

/// Positions of the simulation date inside [`INTEHEAD`].
const INTEHEAD_DAY: usize = 64;
const INTEHEAD_MONTH: usize = 65;
const INTEHEAD_YEAR: usize = 66;

/// Outcome of reading one block from a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRead {
    /// The block was terminated by the start of the next one; the
    /// stream is positioned on that boundary.
    MoreBlocks,
    /// The stream is exhausted.
    EndOfStream,
}

/// An ordered collection of uniquely named records, covering one report
/// step of a result file.
///
/// Records keep their insertion order for iteration and writing, and
/// are additionally indexed by name for O(1) lookup. Records are held
/// behind [`Arc`] so a block and its callers can share payloads without
/// copying.
#[derive(Debug, Clone, Default)]
pub struct Block {
    records: Vec<Arc<Record>>,
    by_name: HashMap<String, usize>,
    report_nr: Option<i32>,
}

impl Block {
    /// An empty block with no assigned report number.
    pub fn new() -> Self {
        Block::default()
    }

    /// The report number this block belongs to, when known.
    pub fn report_nr(&self) -> Option<i32> {
        self.report_nr
    }

    /// Assign the report number.
    pub fn set_report_nr(&mut self, report_nr: i32) {
        self.report_nr = Some(report_nr);
    }

    /// Number of records in the block.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the block holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether a record by `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// The records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.records.iter()
    }

    /// The first record, if any.
    pub fn first(&self) -> Option<&Arc<Record>> {
        self.records.first()
    }

    /// The record following the one named `name` in insertion order.
    pub fn next_after(&self, name: &str) -> Option<&Arc<Record>> {
        let index = *self.by_name.get(name)?;
        self.records.get(index + 1)
    }

    /// Look up a record by name.
    pub fn get(&self, name: &str) -> CaprockResult<&Arc<Record>> {
        self.by_name
            .get(name)
            .map(|&i| &self.records[i])
            .ok_or_else(|| caprock_err!(UnknownKey: "no record {} in block", name))
    }

    /// Look up a record by name, `None` when absent.
    pub fn get_opt(&self, name: &str) -> Option<&Arc<Record>> {
        self.by_name.get(name).map(|&i| &self.records[i])
    }

    /// Add a record the block will share with other holders of the
    /// [`Arc`]. Names are unique within a block; a second record under
    /// an existing name is a no-op returning `false`.
    pub fn add_shared(&mut self, record: Arc<Record>) -> bool {
        let name = record.name().as_str().to_string();
        if self.by_name.contains_key(&name) {
            return false;
        }
        self.by_name.insert(name, self.records.len());
        self.records.push(record);
        true
    }

    /// Add an owned record. See [`Block::add_shared`].
    pub fn add(&mut self, record: Record) -> bool {
        self.add_shared(Arc::new(record))
    }

    /// Add a copy of a record the caller keeps.
    pub fn add_copy(&mut self, record: &Record) -> bool {
        self.add_shared(Arc::new(record.clone()))
    }

    /// Add an owned record, treating a duplicate name as an error.
    pub fn try_add(&mut self, record: Record) -> CaprockResult<()> {
        let name = record.name().as_str().to_string();
        if !self.add(record) {
            caprock_bail!(DuplicateKey: "block already holds a record named {}", name);
        }
        Ok(())
    }

    /// Extract the record named `name`, returning it.
    pub fn detach(&mut self, name: &str) -> CaprockResult<Arc<Record>> {
        let index = self
            .by_name
            .remove(name)
            .ok_or_else(|| caprock_err!(UnknownKey: "no record {} in block", name))?;
        let record = self.records.remove(index);
        for slot in self.by_name.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
        Ok(record)
    }

    /// Drop the record named `name`.
    pub fn remove(&mut self, name: &str) -> CaprockResult<()> {
        self.detach(name).map(|_| ())
    }

    /// The simulation time of a restart block, read from the day,
    /// month and year slots of its [`INTEHEAD`] record.
    pub fn sim_time_restart(&self) -> CaprockResult<DateTime> {
        let intehead = self.get(INTEHEAD)?;
        let day = intehead.int_at(INTEHEAD_DAY)?;
        let month = intehead.int_at(INTEHEAD_MONTH)?;
        let year = intehead.int_at(INTEHEAD_YEAR)?;
        build_date(day, month, year)
    }

    /// The simulation time of a summary block, read from the given
    /// slots of its [`PARAMS`] record. The slot positions come from the
    /// specification header; the stored values are floats and are
    /// rounded to the nearest integer.
    pub fn sim_time_summary(
        &self,
        day_index: usize,
        month_index: usize,
        year_index: usize,
    ) -> CaprockResult<DateTime> {
        let params = self.get(PARAMS)?;
        #[allow(clippy::cast_possible_truncation)]
        let at = |index: usize| -> CaprockResult<i32> {
            Ok(params.f64_at(index)?.round() as i32)
        };
        build_date(at(day_index)?, at(month_index)?, at(year_index)?)
    }

    /// Read one block from the current stream position.
    ///
    /// Reading stops, with the stream rewound to the boundary, when a
    /// [`SEQHDR`] record follows at least one already-read record, or
    /// when a record name repeats. Both conditions mark the start of
    /// the next report step. At end of stream the block simply holds
    /// whatever was read.
    pub fn read_from(&mut self, stream: &mut dyn RecordStream) -> CaprockResult<BlockRead> {
        self.read_selected(stream, None)
    }

    /// Like [`Block::read_from`], but only materializing records whose
    /// names appear in `selection`. Boundary detection still considers
    /// every record.
    pub fn read_selected(
        &mut self,
        stream: &mut dyn RecordStream,
        selection: Option<&[&str]>,
    ) -> CaprockResult<BlockRead> {
        let mut seen: HashSet<String> = HashSet::new();
        loop {
            let boundary = stream.offset()?;
            let Some(header) = stream.read_header()? else {
                self.note_report_nr();
                return Ok(BlockRead::EndOfStream);
            };
            let name = header.name.as_str().to_string();

            if (name == SEQHDR && !seen.is_empty()) || seen.contains(&name) {
                stream.seek(boundary)?;
                self.note_report_nr();
                return Ok(BlockRead::MoreBlocks);
            }
            seen.insert(name.clone());

            let wanted = selection.is_none_or(|names| names.contains(&name.as_str()));
            if wanted {
                let data = stream.read_payload(header.data_type, header.count)?;
                self.try_add(Record::new(header.name, data))?;
            } else {
                stream.skip_payload(header.data_type, header.count)?;
            }
        }
    }

    /// Write every record to `stream` in insertion order.
    pub fn write_to(&self, stream: &mut dyn RecordStream) -> CaprockResult<()> {
        for record in &self.records {
            record.write_to(stream)?;
        }
        Ok(())
    }

    fn note_report_nr(&mut self) {
        if self.report_nr.is_some() {
            return;
        }
        if let Some(nr) = self.get_opt(SEQNUM).and_then(|r| r.int_at(0).ok()) {
            self.report_nr = Some(nr);
        }
    }
}

fn build_date(day: i32, month: i32, year: i32) -> CaprockResult<DateTime> {
    let year = i16::try_from(year)
        .map_err(|_| caprock_err!("year {} out of range in simulation date", year))?;
    let month = i8::try_from(month)
        .map_err(|_| caprock_err!("month {} out of range in simulation date", month))?;
    let day = i8::try_from(day)
        .map_err(|_| caprock_err!("day {} out of range in simulation date", day))?;
    let date = jiff::civil::Date::new(year, month, day).map_err(|e| {
        caprock_err!("invalid simulation date {:04}-{:02}-{:02}: {}", year, month, day, e)
    })?;
    Ok(date.at(0, 0, 0, 0))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use caprock_error::CaprockError;
    use jiff::civil::date;

    use super::{Block, BlockRead, SEQHDR};
    use crate::{BinaryStream, Record, RecordData, RecordStream};

    fn seqhdr() -> Record {
        Record::new(SEQHDR, RecordData::Int(vec![]))
    }

    fn seqnum(nr: i32) -> Record {
        Record::new("SEQNUM", RecordData::Int(vec![nr]))
    }

    #[test]
    fn lookup_and_order() {
        let mut block = Block::new();
        block.try_add(seqnum(3)).unwrap();
        block
            .try_add(Record::new("PRESSURE", RecordData::Float(vec![1.0, 2.0])))
            .unwrap();
        block
            .try_add(Record::new("SWAT", RecordData::Float(vec![0.5, 0.75])))
            .unwrap();

        assert_eq!(block.len(), 3);
        assert_eq!(block.get("SWAT").unwrap().f64_at(1).unwrap(), 0.75);
        assert!(matches!(
            block.get("SOIL").unwrap_err(),
            CaprockError::UnknownKey(..)
        ));
        assert_eq!(block.first().unwrap().name().as_str(), "SEQNUM");
        assert_eq!(
            block.next_after("PRESSURE").unwrap().name().as_str(),
            "SWAT"
        );
        assert!(block.next_after("SWAT").is_none());
    }

    #[test]
    fn duplicate_add_is_refused() {
        let mut block = Block::new();
        assert!(block.add(seqnum(0)));
        assert!(!block.add(seqnum(1)));
        assert_eq!(block.len(), 1);
        // The original record stays untouched.
        assert_eq!(block.get("SEQNUM").unwrap().int_at(0).unwrap(), 0);
        let err = block.try_add(seqnum(2)).unwrap_err();
        assert!(matches!(err, CaprockError::DuplicateKey(..)));
    }

    #[test]
    fn remove_keeps_index_consistent() {
        let mut block = Block::new();
        for name in ["A", "B", "C"] {
            block
                .try_add(Record::new(name, RecordData::Int(vec![1])))
                .unwrap();
        }
        block.remove("B").unwrap();
        assert_eq!(block.len(), 2);
        assert_eq!(block.get("C").unwrap().name().as_str(), "C");
        assert_eq!(block.next_after("A").unwrap().name().as_str(), "C");
        assert!(matches!(
            block.remove("B").unwrap_err(),
            CaprockError::UnknownKey(..)
        ));
    }

    #[test]
    fn seqhdr_terminates_block_with_rewind() {
        let mut stream = BinaryStream::new(Cursor::new(Vec::new()), false);
        for rec in [
            seqhdr(),
            seqnum(0),
            Record::new("PRESSURE", RecordData::Float(vec![1.0])),
            seqhdr(),
            seqnum(1),
        ] {
            rec.write_to(&mut stream).unwrap();
        }
        stream.seek(0).unwrap();

        let mut first = Block::new();
        assert_eq!(first.read_from(&mut stream).unwrap(), BlockRead::MoreBlocks);
        assert_eq!(first.len(), 3);
        assert_eq!(first.report_nr(), Some(0));

        let mut second = Block::new();
        assert_eq!(
            second.read_from(&mut stream).unwrap(),
            BlockRead::EndOfStream
        );
        assert_eq!(second.report_nr(), Some(1));
    }

    #[test]
    fn repeated_name_terminates_block_with_rewind() {
        // Restart steps carry no SEQHDR; the boundary shows as the
        // header record repeating.
        let mut stream = BinaryStream::new(Cursor::new(Vec::new()), false);
        for rec in [
            Record::new("INTEHEAD", RecordData::Int(vec![0; 70])),
            Record::new("PRESSURE", RecordData::Float(vec![1.0])),
            Record::new("INTEHEAD", RecordData::Int(vec![0; 70])),
            Record::new("PRESSURE", RecordData::Float(vec![2.0])),
        ] {
            rec.write_to(&mut stream).unwrap();
        }
        stream.seek(0).unwrap();

        let mut first = Block::new();
        assert_eq!(first.read_from(&mut stream).unwrap(), BlockRead::MoreBlocks);
        assert_eq!(first.len(), 2);

        let mut second = Block::new();
        assert_eq!(
            second.read_from(&mut stream).unwrap(),
            BlockRead::EndOfStream
        );
        assert_eq!(second.get("PRESSURE").unwrap().f64_at(0).unwrap(), 2.0);
    }

    #[test]
    fn read_selected_skips_unwanted_payloads() {
        let mut stream = BinaryStream::new(Cursor::new(Vec::new()), false);
        for rec in [
            seqnum(4),
            Record::new("PRESSURE", RecordData::Float(vec![1.0])),
            Record::new("SWAT", RecordData::Float(vec![0.5])),
        ] {
            rec.write_to(&mut stream).unwrap();
        }
        stream.seek(0).unwrap();

        let mut block = Block::new();
        block
            .read_selected(&mut stream, Some(&["SEQNUM", "SWAT"]))
            .unwrap();
        assert_eq!(block.len(), 2);
        assert!(block.contains("SWAT"));
        assert!(!block.contains("PRESSURE"));
        assert_eq!(block.report_nr(), Some(4));
    }

    #[test]
    fn restart_sim_time_from_intehead() {
        let mut intehead = vec![0; 70];
        intehead[64] = 15;
        intehead[65] = 3;
        intehead[66] = 2024;
        let mut block = Block::new();
        block
            .try_add(Record::new("INTEHEAD", RecordData::Int(intehead)))
            .unwrap();
        assert_eq!(
            block.sim_time_restart().unwrap(),
            date(2024, 3, 15).at(0, 0, 0, 0)
        );
    }

    #[test]
    fn summary_sim_time_from_params() {
        let mut params = vec![0.0f32; 10];
        params[2] = 1.2;
        params[3] = 7.4;
        params[4] = 1999.6;
        let mut block = Block::new();
        block
            .try_add(Record::new("PARAMS", RecordData::Float(params)))
            .unwrap();
        assert_eq!(
            block.sim_time_summary(2, 3, 4).unwrap(),
            date(2000, 7, 1).at(0, 0, 0, 0)
        );
    }

    #[test]
    fn write_round_trip() {
        let mut block = Block::new();
        block.try_add(seqnum(9)).unwrap();
        block
            .try_add(Record::new(
                "WGNAMES",
                RecordData::Str(vec!["OP_1".into()]),
            ))
            .unwrap();

        let mut stream = BinaryStream::new(Cursor::new(Vec::new()), false);
        block.write_to(&mut stream).unwrap();
        stream.seek(0).unwrap();

        let mut back = Block::new();
        back.read_from(&mut stream).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.get("WGNAMES").unwrap().str_at(0).unwrap(), "OP_1");
    }
}
