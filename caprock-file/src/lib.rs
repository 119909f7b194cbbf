#![deny(missing_docs)]

//! Whole-file views over block-structured result files.
//!
//! A [`FileState`] aggregates the [`Block`]s of one result case, parsed
//! either from a single unified file or from a set of per-step files,
//! and addresses them two ways: by position in the parse order, or by
//! the simulator-assigned report-step number. Files are opened through
//! [`FileStateOptions`], which fixes the file kind, text or binary
//! rendition, byte order and report numbering up front.

use std::path::{Path, PathBuf};

use caprock_error::{CaprockResult, caprock_bail, caprock_err};
use caprock_records::{
    Block, BlockRead, Format, MINISTEP, RecordStream, create_stream, open_stream,
};
use itertools::Itertools;


/// The category of a result file set. The kind decides block boundary
/// handling, filtering and which addressing schemes apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// One restart file per report step.
    Restart,
    /// All restart steps in one growing file.
    UnifiedRestart,
    /// One summary data file per report step.
    Summary,
    /// All summary ministeps in one growing file.
    UnifiedSummary,
    /// A static init file; one block, no time axis.
    Init,
    /// Anything else; positional addressing only.
    Other,
}

impl FileKind {
    /// Whether this kind carries report-step numbers at all.
    pub fn supports_report_mode(&self) -> bool {
        matches!(
            self,
            FileKind::Restart
                | FileKind::UnifiedRestart
                | FileKind::Summary
                | FileKind::UnifiedSummary
        )
    }

    fn is_summary(&self) -> bool {
        matches!(self, FileKind::Summary | FileKind::UnifiedSummary)
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FileKind::Restart => "restart",
            FileKind::UnifiedRestart => "unified restart",
            FileKind::Summary => "summary",
            FileKind::UnifiedSummary => "unified summary",
            FileKind::Init => "init",
            FileKind::Other => "other",
        };
        write!(f, "{name}")
    }
}

/// How per-step files get their report numbers. Unified files carry
/// the number in-band (in their `SEQNUM` records) and ignore this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPolicy {
    /// Parse the number embedded in each file name's extension, e.g.
    /// `CASE.X0007` is report 7. Summary data files are conventionally
    /// numbered from 1 while holding reports from 0, so a summary
    /// `CASE.S0001` maps to report 0 and, when it carries a second
    /// ministep, that continuation is report 1.
    FilenameIndex,
    /// Number files by position in the given list, starting at
    /// `origin`.
    Counter {
        /// Report number of the first file.
        origin: i32,
    },
}

/// Builder for [`FileState`]. Obtained from [`FileState::options`].
#[derive(Debug, Clone)]
pub struct FileStateOptions {
    kind: FileKind,
    format: Format,
    endian_convert: bool,
    report_mode: bool,
    report_policy: ReportPolicy,
}

impl FileStateOptions {
    fn new(kind: FileKind) -> Self {
        FileStateOptions {
            kind,
            format: Format::Unformatted,
            endian_convert: false,
            report_mode: false,
            report_policy: ReportPolicy::FilenameIndex,
        }
    }

    /// Configure the text or binary rendition. Defaults to binary.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Configure byte swapping of binary numeric payloads.
    pub fn with_endian_convert(mut self, endian_convert: bool) -> Self {
        self.endian_convert = endian_convert;
        self
    }

    /// Address blocks by report-step number instead of position.
    pub fn with_report_mode(mut self, report_mode: bool) -> Self {
        self.report_mode = report_mode;
        self
    }

    /// Configure how per-step files are numbered.
    pub fn with_report_policy(mut self, report_policy: ReportPolicy) -> Self {
        self.report_policy = report_policy;
        self
    }

    /// Parse one unified file holding every report step.
    pub fn open_unified(self, path: impl Into<PathBuf>) -> CaprockResult<FileState> {
        self.check_report_mode()?;
        let path = path.into();
        let mut stream = open_stream(&path, self.format, self.endian_convert)?;
        let blocks = self.read_blocks(stream.as_mut())?;
        self.finish(blocks, vec![path], true)
    }

    /// Parse an ordered list of per-step files, one or more blocks per
    /// file.
    pub fn open_per_step(
        self,
        paths: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> CaprockResult<FileState> {
        self.check_report_mode()?;
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        let mut blocks = Vec::new();
        for (file_nr, path) in paths.iter().enumerate() {
            let mut stream = open_stream(path, self.format, self.endian_convert)?;
            let from_file = self.read_blocks(stream.as_mut())?;
            let mut report_nr = self.file_report_nr(path, file_nr)?;
            for mut block in from_file {
                if block.report_nr().is_none() {
                    block.set_report_nr(report_nr);
                }
                // The first summary data file carries report 0 and its
                // continuation, report 1.
                if self.bumps_continuation() && report_nr == 0 {
                    report_nr = 1;
                }
                blocks.push(block);
            }
        }
        self.finish(blocks, paths, false)
    }

    fn check_report_mode(&self) -> CaprockResult<()> {
        if self.report_mode && !self.kind.supports_report_mode() {
            caprock_bail!(
                InvalidConfiguration: "report mode is not available for {} files",
                self.kind
            );
        }
        Ok(())
    }

    /// Read blocks until the stream runs out, applying the kind's
    /// filtering rules.
    fn read_blocks(&self, stream: &mut dyn RecordStream) -> CaprockResult<Vec<Block>> {
        let mut blocks = Vec::new();
        loop {
            let mut block = Block::new();
            let status = block.read_from(stream)?;
            if self.keep_block(&block) {
                blocks.push(block);
            }
            if status == BlockRead::EndOfStream {
                return Ok(blocks);
            }
        }
    }

    fn keep_block(&self, block: &Block) -> bool {
        if block.is_empty() {
            return false;
        }
        // A summary step without its marker record is a partially
        // written trailing segment.
        if self.kind.is_summary() && !block.contains(MINISTEP) {
            let report = block
                .report_nr()
                .map_or_else(|| "unnumbered".to_string(), |nr| format!("report {nr}"));
            log::warn!("discarding incomplete summary block ({report}): no {MINISTEP} record");
            return false;
        }
        true
    }

    fn bumps_continuation(&self) -> bool {
        self.kind.is_summary() && self.report_policy == ReportPolicy::FilenameIndex
    }

    fn file_report_nr(&self, path: &Path, file_nr: usize) -> CaprockResult<i32> {
        match self.report_policy {
            ReportPolicy::Counter { origin } => {
                let offset = i32::try_from(file_nr)
                    .map_err(|_| caprock_err!(InvalidConfiguration: "file list too long"))?;
                Ok(origin + offset)
            }
            ReportPolicy::FilenameIndex => {
                let nr = filename_index(path)?;
                if self.kind.is_summary() && nr == 1 {
                    Ok(0)
                } else {
                    Ok(nr)
                }
            }
        }
    }

    fn finish(
        &self,
        blocks: Vec<Block>,
        paths: Vec<PathBuf>,
        unified: bool,
    ) -> CaprockResult<FileState> {
        if self.report_mode {
            for (position, block) in blocks.iter().enumerate() {
                if block.report_nr().is_none() {
                    caprock_bail!(
                        InvalidConfiguration: "report mode needs a report number on every block, block {} has none",
                        position
                    );
                }
            }
            for nr in blocks.iter().filter_map(Block::report_nr).duplicates() {
                log::warn!("duplicate report number {nr}; the first occurrence wins");
            }
        }
        Ok(FileState {
            kind: self.kind,
            format: self.format,
            endian_convert: self.endian_convert,
            report_mode: self.report_mode,
            unified,
            paths,
            blocks,
        })
    }
}

/// Parse the report number embedded in a per-step file extension,
/// e.g. `CASE.X0007` or `CASE.S0012`.
fn filename_index(path: &Path) -> CaprockResult<i32> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| caprock_err!(InvalidConfiguration: "{} has no file extension to number it by", path.display()))?;
    let digits = extension.trim_start_matches(|c: char| !c.is_ascii_digit());
    digits.parse().map_err(|_| {
        caprock_err!(
            InvalidConfiguration: "cannot read a report number from extension '{}' of {}",
            extension,
            path.display()
        )
    })
}

/// The parsed blocks of one result case.
///
/// The block list is fixed at construction. Lookup runs in one of two
/// addressing schemes chosen at open time: positional (parse order) or
/// report mode, where [`FileState::get`] scans for the block carrying a
/// report number.
#[derive(Debug)]
pub struct FileState {
    kind: FileKind,
    format: Format,
    endian_convert: bool,
    report_mode: bool,
    unified: bool,
    paths: Vec<PathBuf>,
    blocks: Vec<Block>,
}

impl FileState {
    /// Start configuring a file set of the given kind.
    pub fn options(kind: FileKind) -> FileStateOptions {
        FileStateOptions::new(kind)
    }

    /// The file kind fixed at open time.
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Whether the case was parsed from one unified file.
    pub fn unified(&self) -> bool {
        self.unified
    }

    /// The rendition [`FileState::save`] writes in.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Switch the rendition used by [`FileState::save`], converting the
    /// case to the other codec on the next write.
    pub fn set_format(&mut self, format: Format) {
        self.format = format;
    }

    /// Whether [`FileState::get`] addresses by report number.
    pub fn report_mode(&self) -> bool {
        self.report_mode
    }

    /// The backing files, in parse order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Number of blocks held.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// The blocks in parse order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Positional lookup, ignoring report mode.
    pub fn block(&self, position: usize) -> CaprockResult<&Block> {
        self.blocks.get(position).ok_or_else(|| {
            caprock_err!(
                IndexOutOfRange: "block position {} outside [0, {})",
                position,
                self.blocks.len()
            )
        })
    }

    /// Look up a block. In report mode `index` is a report-step number
    /// and the first block carrying it wins; otherwise `index` is a
    /// position in parse order.
    pub fn get(&self, index: i32) -> CaprockResult<&Block> {
        if self.report_mode {
            self.blocks
                .iter()
                .find(|b| b.report_nr() == Some(index))
                .ok_or_else(|| caprock_err!(UnknownKey: "no block with report number {}", index))
        } else {
            let position = usize::try_from(index).map_err(|_| {
                caprock_err!(IndexOutOfRange: "block position {} outside [0, {})", index, self.blocks.len())
            })?;
            self.block(position)
        }
    }

    /// Whether [`FileState::get`] resolves `index`.
    pub fn has_block(&self, index: i32) -> bool {
        if self.report_mode {
            self.blocks.iter().any(|b| b.report_nr() == Some(index))
        } else {
            usize::try_from(index).is_ok_and(|position| position < self.blocks.len())
        }
    }

    /// The inclusive range of indices [`FileState::get`] accepts: the
    /// first and last report numbers in report mode, `[0, N-1]`
    /// otherwise.
    pub fn report_span(&self) -> CaprockResult<(i32, i32)> {
        if self.blocks.is_empty() {
            caprock_bail!(IndexOutOfRange: "no blocks loaded");
        }
        if self.report_mode {
            let first = self.report_nr_of(0)?;
            let last = self.report_nr_of(self.blocks.len() - 1)?;
            Ok((first, last))
        } else {
            let last = i32::try_from(self.blocks.len() - 1)
                .map_err(|_| caprock_err!(IndexOutOfRange: "too many blocks for an i32 span"))?;
            Ok((0, last))
        }
    }

    fn report_nr_of(&self, position: usize) -> CaprockResult<i32> {
        self.blocks[position]
            .report_nr()
            .ok_or_else(|| caprock_err!(InvalidConfiguration: "block {} carries no report number", position))
    }

    /// Write every block back to the recorded paths: all blocks into
    /// one stream for a unified case, one file per block otherwise.
    pub fn save(&self) -> CaprockResult<()> {
        if self.unified {
            let path = self
                .paths
                .first()
                .ok_or_else(|| caprock_err!(InvalidConfiguration: "no backing path recorded"))?;
            let mut stream = create_stream(path, self.format, self.endian_convert)?;
            for block in &self.blocks {
                block.write_to(stream.as_mut())?;
            }
            Ok(())
        } else {
            if self.paths.len() != self.blocks.len() {
                caprock_bail!(
                    InvalidConfiguration: "{} blocks but {} backing files; cannot save per step",
                    self.blocks.len(),
                    self.paths.len()
                );
            }
            for (path, block) in self.paths.iter().zip(&self.blocks) {
                let mut stream = create_stream(path, self.format, self.endian_convert)?;
                block.write_to(stream.as_mut())?;
            }
            Ok(())
        }
    }
}
