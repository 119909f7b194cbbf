use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use caprock_error::{CaprockResult, caprock_bail, caprock_err};
use caprock_records::{Block, Format, Record, open_stream};
use jiff::civil::DateTime;

use crate::keys::DEFAULT_JOIN;
use crate::node::SummaryNode;

/// Global grid dimensions, used to translate between encoded cell
/// numbers and 1-based `(i, j, k)` coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDims {
    nx: i32,
    ny: i32,
    nz: i32,
}

impl GridDims {
    /// Dimensions of an `nx` by `ny` by `nz` grid.
    pub fn new(nx: i32, ny: i32, nz: i32) -> Self {
        GridDims { nx, ny, nz }
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> i32 {
        self.nx * self.ny * self.nz
    }

    /// Decode a 1-based cell number into 1-based `(i, j, k)`.
    pub fn decode_cell(&self, num: i32) -> CaprockResult<(i32, i32, i32)> {
        if num < 1 || num > self.cell_count() {
            caprock_bail!(
                IndexOutOfRange: "cell number {} outside [1, {}]",
                num,
                self.cell_count()
            );
        }
        let global = num - 1;
        let k = global / (self.nx * self.ny);
        let rest = global % (self.nx * self.ny);
        let j = rest / self.nx;
        let i = rest % self.nx;
        Ok((i + 1, j + 1, k + 1))
    }

    /// Encode 1-based `(i, j, k)` into a 1-based cell number.
    pub fn encode_cell(&self, (i, j, k): (i32, i32, i32)) -> CaprockResult<i32> {
        if i < 1 || i > self.nx || j < 1 || j > self.ny || k < 1 || k > self.nz {
            caprock_bail!(
                IndexOutOfRange: "cell ({},{},{}) outside {}x{}x{} grid",
                i,
                j,
                k,
                self.nx,
                self.ny,
                self.nz
            );
        }
        Ok((i - 1) + (j - 1) * self.nx + (k - 1) * self.nx * self.ny + 1)
    }
}

/// The parsed specification header of one summary case: every
/// available vector as a [`SummaryNode`], indexed by its compound
/// keys, plus the grid shape and simulation start time.
#[derive(Debug)]
pub struct SummarySpec {
    dims: GridDims,
    start_date: DateTime,
    join: String,
    param_count: usize,
    nodes: Vec<SummaryNode>,
    by_key: HashMap<String, usize>,
    time_index: Option<usize>,
    date_indices: Option<(usize, usize, usize)>,
}

impl SummarySpec {
    /// Open and parse a specification file with the default join
    /// string.
    pub fn open(path: &Path, format: Format, endian_convert: bool) -> CaprockResult<Self> {
        let mut stream = open_stream(path, format, endian_convert)?;
        let mut block = Block::new();
        block.read_from(stream.as_mut())?;
        Self::from_block(&block, DEFAULT_JOIN)
    }

    /// Parse an already loaded specification block.
    pub fn from_block(block: &Block, join: &str) -> CaprockResult<Self> {
        let dimens = block.get("DIMENS")?;
        let param_count = usize::try_from(dimens.int_at(0)?)
            .map_err(|_| caprock_err!("negative vector count in DIMENS"))?;
        let dims = GridDims::new(dimens.int_at(1)?, dimens.int_at(2)?, dimens.int_at(3)?);

        let startdat = block.get("STARTDAT")?;
        let start_date = build_date(
            startdat.int_at(0)?,
            startdat.int_at(1)?,
            startdat.int_at(2)?,
        )?;

        let keywords = block.get("KEYWORDS")?;
        if keywords.len() != param_count {
            caprock_bail!(
                SchemaMismatch: "KEYWORDS holds {} entries, DIMENS declares {}",
                keywords.len(),
                param_count
            );
        }
        let wgnames = block.get_opt("WGNAMES");
        let units = block.get_opt("UNITS");
        let nums = block.get_opt("NUMS");
        let lgrs = block.get_opt("LGRS");
        let numlx = block.get_opt("NUMLX");
        let numly = block.get_opt("NUMLY");
        let numlz = block.get_opt("NUMLZ");

        let mut nodes = Vec::new();
        for params_index in 0..param_count {
            let keyword = keywords.str_at(params_index)?;
            let wgname = column_str(wgnames, params_index)?;
            let unit = column_str(units, params_index)?.unwrap_or("");
            let num = column_int(nums, params_index)?;
            let lgr_name = column_str(lgrs, params_index)?.filter(|name| !name.is_empty());
            let lgr_ijk = match (
                column_int(numlx, params_index)?,
                column_int(numly, params_index)?,
                column_int(numlz, params_index)?,
            ) {
                (Some(i), Some(j), Some(k)) => Some((i, j, k)),
                _ => None,
            };

            let node = SummaryNode::new(
                keyword,
                wgname,
                num,
                unit,
                lgr_name,
                lgr_ijk,
                &dims,
                params_index,
                join,
            )?;
            if let Some(node) = node {
                nodes.push(node);
            }
        }

        let mut by_key = HashMap::new();
        for (position, node) in nodes.iter().enumerate() {
            for key in [node.primary_key(), node.secondary_key()]
                .into_iter()
                .flatten()
            {
                if by_key.insert(key.to_string(), position).is_some() {
                    log::warn!("duplicate summary key {key}; the later vector wins");
                }
            }
        }

        let mut spec = SummarySpec {
            dims,
            start_date,
            join: join.to_string(),
            param_count,
            nodes,
            by_key,
            time_index: None,
            date_indices: None,
        };
        spec.time_index = spec.params_index("TIME").ok();
        spec.date_indices = match (
            spec.params_index("DAY").ok(),
            spec.params_index("MONTH").ok(),
            spec.params_index("YEAR").ok(),
        ) {
            (Some(d), Some(m), Some(y)) => Some((d, m, y)),
            _ => None,
        };
        Ok(spec)
    }

    /// The global grid shape.
    pub fn dims(&self) -> &GridDims {
        &self.dims
    }

    /// Simulation start, at midnight of the header's start date.
    pub fn start_date(&self) -> DateTime {
        self.start_date
    }

    /// The separator used in this case's compound keys.
    pub fn join(&self) -> &str {
        &self.join
    }

    /// Width of each time step's `PARAMS` payload.
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// Every constructed node, in header order.
    pub fn nodes(&self) -> &[SummaryNode] {
        &self.nodes
    }

    /// Whether a compound key resolves.
    pub fn has_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// The node behind a compound key.
    pub fn node(&self, key: &str) -> CaprockResult<&SummaryNode> {
        self.by_key
            .get(key)
            .map(|&position| &self.nodes[position])
            .ok_or_else(|| caprock_err!(UnknownKey: "no summary vector {}", key))
    }

    /// Resolve a compound key to its payload position.
    pub fn params_index(&self, key: &str) -> CaprockResult<usize> {
        Ok(self.node(key)?.params_index())
    }

    /// Payload position of the elapsed-days vector, when the case
    /// carries one.
    pub fn time_index(&self) -> Option<usize> {
        self.time_index
    }

    /// Payload positions of the day, month and year vectors, when the
    /// case carries all three.
    pub fn date_indices(&self) -> Option<(usize, usize, usize)> {
        self.date_indices
    }

    /// Rename the well or group behind `key`, recomputing and
    /// reindexing that node's keys.
    pub fn rebind_wgname(&mut self, key: &str, wgname: &str) -> CaprockResult<()> {
        let position = *self
            .by_key
            .get(key)
            .ok_or_else(|| caprock_err!(UnknownKey: "no summary vector {}", key))?;
        let old_keys: Vec<String> = [
            self.nodes[position].primary_key(),
            self.nodes[position].secondary_key(),
        ]
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
        for old in old_keys {
            self.by_key.remove(&old);
        }

        let join = self.join.clone();
        self.nodes[position].rebind_wgname(wgname, &join);
        for key in [
            self.nodes[position].primary_key(),
            self.nodes[position].secondary_key(),
        ]
        .into_iter()
        .flatten()
        {
            self.by_key.insert(key.to_string(), position);
        }
        Ok(())
    }

    /// Extract one step's value vector, checking width against the
    /// header.
    pub(crate) fn params_of(&self, record: &Arc<Record>) -> CaprockResult<Vec<f64>> {
        if record.len() != self.param_count {
            caprock_bail!(
                SchemaMismatch: "step payload holds {} values, header declares {}",
                record.len(),
                self.param_count
            );
        }
        (0..record.len()).map(|i| record.f64_at(i)).collect()
    }
}

fn column_str(record: Option<&Arc<Record>>, index: usize) -> CaprockResult<Option<&str>> {
    record.map(|r| r.str_at(index)).transpose()
}

fn column_int(record: Option<&Arc<Record>>, index: usize) -> CaprockResult<Option<i32>> {
    record.map(|r| r.int_at(index)).transpose()
}

fn build_date(day: i32, month: i32, year: i32) -> CaprockResult<DateTime> {
    let year = i16::try_from(year)
        .map_err(|_| caprock_err!("year {} out of range in start date", year))?;
    let month = i8::try_from(month)
        .map_err(|_| caprock_err!("month {} out of range in start date", month))?;
    let day = i8::try_from(day)
        .map_err(|_| caprock_err!("day {} out of range in start date", day))?;
    let date = jiff::civil::Date::new(year, month, day).map_err(|e| {
        caprock_err!("invalid start date {:04}-{:02}-{:02}: {}", year, month, day, e)
    })?;
    Ok(date.at(0, 0, 0, 0))
}

#[cfg(test)]
mod tests {
    use caprock_error::CaprockError;
    use caprock_records::{Block, Record, RecordData};
    use jiff::civil::date;
    use rstest::rstest;

    use super::{GridDims, SummarySpec};
    use crate::node::{DUMMY_WELL, VarType};

    #[rstest]
    #[case(1, (1, 1, 1))]
    #[case(20, (20, 1, 1))]
    #[case(21, (1, 2, 1))]
    #[case(201, (1, 1, 2))]
    #[case(1000, (20, 10, 5))]
    fn cell_codec_identity(#[case] num: i32, #[case] ijk: (i32, i32, i32)) {
        let dims = GridDims::new(20, 10, 5);
        assert_eq!(dims.decode_cell(num).unwrap(), ijk);
        assert_eq!(dims.encode_cell(ijk).unwrap(), num);
    }

    #[test]
    fn cell_codec_bounds() {
        let dims = GridDims::new(20, 10, 5);
        assert!(matches!(
            dims.decode_cell(0).unwrap_err(),
            CaprockError::IndexOutOfRange(..)
        ));
        assert!(matches!(
            dims.decode_cell(1001).unwrap_err(),
            CaprockError::IndexOutOfRange(..)
        ));
        assert!(matches!(
            dims.encode_cell((21, 1, 1)).unwrap_err(),
            CaprockError::IndexOutOfRange(..)
        ));
    }

    fn header_block() -> Block {
        let mut block = Block::new();
        block.add(Record::new(
            "DIMENS",
            RecordData::Int(vec![6, 20, 10, 5, 0, 0]),
        ));
        block.add(Record::new("STARTDAT", RecordData::Int(vec![1, 6, 2020])));
        block.add(Record::new(
            "KEYWORDS",
            RecordData::Str(
                ["TIME", "WOPR", "WOPT", "FOPT", "RPR", "BPR"]
                    .map(str::to_string)
                    .to_vec(),
            ),
        ));
        block.add(Record::new(
            "WGNAMES",
            RecordData::Str(
                ["", "OP_1", DUMMY_WELL, "", "", ""]
                    .map(str::to_string)
                    .to_vec(),
            ),
        ));
        block.add(Record::new(
            "UNITS",
            RecordData::Str(
                ["DAYS", "SM3/DAY", "SM3", "SM3", "BARSA", "BARSA"]
                    .map(str::to_string)
                    .to_vec(),
            ),
        ));
        block.add(Record::new(
            "NUMS",
            RecordData::Int(vec![0, 0, 0, 0, 3, 272]),
        ));
        block
    }

    #[test]
    fn parses_header_and_indexes_keys() {
        let spec = SummarySpec::from_block(&header_block(), ":").unwrap();

        assert_eq!(spec.param_count(), 6);
        assert_eq!(spec.start_date(), date(2020, 6, 1).at(0, 0, 0, 0));
        // WOPT belongs to the placeholder well and never became a node.
        assert_eq!(spec.nodes().len(), 5);

        assert_eq!(spec.params_index("WOPR:OP_1").unwrap(), 1);
        assert_eq!(spec.params_index("FOPT").unwrap(), 3);
        assert_eq!(spec.params_index("RPR:3").unwrap(), 4);
        assert_eq!(spec.params_index("BPR:272").unwrap(), 5);
        assert_eq!(spec.params_index("BPR:12,4,2").unwrap(), 5);
        assert!(matches!(
            spec.params_index("WOPT:OP_2").unwrap_err(),
            CaprockError::UnknownKey(..)
        ));

        let node = spec.node("WOPR:OP_1").unwrap();
        assert_eq!(node.var_type(), VarType::Well);
        assert!(node.is_rate());
        assert!(!node.is_total());
        assert_eq!(node.unit(), "SM3/DAY");

        assert_eq!(spec.time_index(), Some(0));
        assert_eq!(spec.date_indices(), None);
    }

    #[test]
    fn keyword_count_must_match_dimens() {
        let mut block = header_block();
        block.remove("KEYWORDS").unwrap();
        block.add(Record::new(
            "KEYWORDS",
            RecordData::Str(vec!["TIME".to_string()]),
        ));
        let err = SummarySpec::from_block(&block, ":").unwrap_err();
        assert!(matches!(err, CaprockError::SchemaMismatch(..)));
    }

    #[test]
    fn missing_required_record_is_unknown_key() {
        let mut block = header_block();
        block.remove("STARTDAT").unwrap();
        let err = SummarySpec::from_block(&block, ":").unwrap_err();
        assert!(matches!(err, CaprockError::UnknownKey(..)));
    }

    #[test]
    fn rebinding_a_well_moves_its_keys() {
        let mut spec = SummarySpec::from_block(&header_block(), ":").unwrap();
        spec.rebind_wgname("WOPR:OP_1", "OP_1A").unwrap();
        assert!(!spec.has_key("WOPR:OP_1"));
        assert_eq!(spec.params_index("WOPR:OP_1A").unwrap(), 1);
    }
}
