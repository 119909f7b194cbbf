use std::path::Path;

use caprock_error::{CaprockResult, caprock_bail, caprock_err};
use caprock_file::{FileKind, FileState};
use caprock_records::{Format, PARAMS};
use jiff::SignedDuration;
use jiff::civil::DateTime;

use crate::spec::SummarySpec;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Which way [`SummarySeries::first_crossing`] compares values against
/// its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// First step with a value strictly above the threshold.
    Greater,
    /// First step with a value strictly below the threshold.
    Less,
}

#[derive(Debug)]
struct Step {
    params: Vec<f64>,
    days: f64,
    time: DateTime,
    report_nr: Option<i32>,
}

/// The time-series side of a summary case: every step's value vector,
/// resolved against the [`SummarySpec`] header and addressable by
/// step index, absolute time or elapsed simulated days.
#[derive(Debug)]
pub struct SummarySeries {
    spec: SummarySpec,
    steps: Vec<Step>,
}

impl SummarySeries {
    /// Bind a parsed data file set to its specification header. Every
    /// block must carry a `PARAMS` record of the header's width, and
    /// the case must expose a time axis, either an elapsed-days vector
    /// or all three date vectors.
    pub fn new(spec: SummarySpec, data: &FileState) -> CaprockResult<Self> {
        let mut steps = Vec::with_capacity(data.num_blocks());
        for block in data.blocks() {
            let params = spec.params_of(block.get(PARAMS)?)?;
            let (days, time) = step_clock(&spec, block, &params)?;
            steps.push(Step {
                params,
                days,
                time,
                report_nr: block.report_nr(),
            });
        }
        Ok(SummarySeries { spec, steps })
    }

    /// Open one unified data file against its specification file.
    pub fn open_unified(
        spec_path: &Path,
        data_path: &Path,
        format: Format,
        endian_convert: bool,
    ) -> CaprockResult<Self> {
        let spec = SummarySpec::open(spec_path, format, endian_convert)?;
        let data = FileState::options(FileKind::UnifiedSummary)
            .with_format(format)
            .with_endian_convert(endian_convert)
            .open_unified(data_path)?;
        Self::new(spec, &data)
    }

    /// Open a list of per-step data files against their specification
    /// file.
    pub fn open_per_step(
        spec_path: &Path,
        data_paths: &[impl AsRef<Path>],
        format: Format,
        endian_convert: bool,
    ) -> CaprockResult<Self> {
        let spec = SummarySpec::open(spec_path, format, endian_convert)?;
        let data = FileState::options(FileKind::Summary)
            .with_format(format)
            .with_endian_convert(endian_convert)
            .open_per_step(data_paths.iter().map(|p| p.as_ref().to_path_buf()))?;
        Self::new(spec, &data)
    }

    /// The specification header this series resolves against.
    pub fn spec(&self) -> &SummarySpec {
        &self.spec
    }

    /// Number of time steps.
    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    /// Whether a compound key resolves.
    pub fn has_key(&self, key: &str) -> bool {
        self.spec.has_key(key)
    }

    fn step(&self, step_index: usize) -> CaprockResult<&Step> {
        self.steps.get(step_index).ok_or_else(|| {
            caprock_err!(
                IndexOutOfRange: "step {} outside [0, {})",
                step_index,
                self.steps.len()
            )
        })
    }

    /// Elapsed simulated days at a step.
    pub fn days(&self, step_index: usize) -> CaprockResult<f64> {
        Ok(self.step(step_index)?.days)
    }

    /// Absolute simulated time at a step.
    pub fn time(&self, step_index: usize) -> CaprockResult<DateTime> {
        Ok(self.step(step_index)?.time)
    }

    /// The report number recorded for a step, when known.
    pub fn report_nr(&self, step_index: usize) -> CaprockResult<Option<i32>> {
        Ok(self.step(step_index)?.report_nr)
    }

    /// Simulation start, from the specification header.
    pub fn start_time(&self) -> DateTime {
        self.spec.start_date()
    }

    /// Absolute simulated time of the last step.
    pub fn end_time(&self) -> CaprockResult<DateTime> {
        let last = self
            .steps
            .last()
            .ok_or_else(|| caprock_err!(IndexOutOfRange: "no steps loaded"))?;
        Ok(last.time)
    }

    /// Convert an elapsed-days coordinate to an absolute time on this
    /// case's clock.
    pub fn time_from_days(&self, days: f64) -> CaprockResult<DateTime> {
        let elapsed = SignedDuration::try_from_secs_f64(days * SECONDS_PER_DAY)
            .map_err(|e| caprock_err!("bad elapsed time {} days: {}", days, e))?;
        self.spec
            .start_date()
            .checked_add(elapsed)
            .map_err(|e| caprock_err!("elapsed time {} days overflows the clock: {}", days, e))
    }

    /// Convert an absolute time to elapsed days since simulation start.
    /// Times before the start come out negative.
    pub fn days_from_time(&self, time: DateTime) -> f64 {
        time.duration_since(self.spec.start_date()).as_secs_f64() / SECONDS_PER_DAY
    }

    /// Total simulated length in days.
    pub fn sim_length_days(&self) -> CaprockResult<f64> {
        let last = self
            .steps
            .last()
            .ok_or_else(|| caprock_err!(IndexOutOfRange: "no steps loaded"))?;
        Ok(last.days)
    }

    /// Direct payload lookup by step and vector position.
    pub fn value_at(&self, step_index: usize, params_index: usize) -> CaprockResult<f64> {
        let step = self.step(step_index)?;
        step.params.get(params_index).copied().ok_or_else(|| {
            caprock_err!(
                IndexOutOfRange: "vector position {} outside [0, {})",
                params_index,
                step.params.len()
            )
        })
    }

    /// Payload lookup by compound key.
    pub fn value(&self, key: &str, step_index: usize) -> CaprockResult<f64> {
        self.value_at(step_index, self.spec.params_index(key)?)
    }

    /// Whether an elapsed-days coordinate falls inside the simulated
    /// span.
    pub fn contains_days(&self, days: f64) -> bool {
        match (self.steps.first(), self.steps.last()) {
            (Some(first), Some(last)) => first.days <= days && days <= last.days,
            _ => false,
        }
    }

    /// Whether an absolute time falls inside the simulated span.
    pub fn contains_time(&self, time: DateTime) -> bool {
        match (self.steps.first(), self.steps.last()) {
            (Some(first), Some(last)) => first.time <= time && time <= last.time,
            _ => false,
        }
    }

    /// The step governing an elapsed-days coordinate: the first step
    /// at or after it.
    pub fn step_at_days(&self, days: f64) -> CaprockResult<usize> {
        if !self.contains_days(days) {
            caprock_bail!(
                IndexOutOfRange: "{} days outside the simulated span",
                days
            );
        }
        self.steps
            .iter()
            .position(|step| step.days >= days)
            .ok_or_else(|| caprock_err!(IndexOutOfRange: "{} days outside the simulated span", days))
    }

    /// Value of a vector at an elapsed-days coordinate.
    pub fn value_at_days(&self, days: f64, params_index: usize) -> CaprockResult<f64> {
        self.value_at(self.step_at_days(days)?, params_index)
    }

    /// Value of a vector at an absolute time.
    pub fn value_at_time(&self, time: DateTime, params_index: usize) -> CaprockResult<f64> {
        if !self.contains_time(time) {
            caprock_bail!(IndexOutOfRange: "{} outside the simulated span", time);
        }
        let days = self.days_from_time(time);
        self.value_at_days(days.max(0.0), params_index)
    }

    /// Scan forward for the first step whose value crosses `limit` in
    /// the given direction. An uncrossed threshold is `None`, not an
    /// error.
    pub fn first_crossing(
        &self,
        params_index: usize,
        limit: f64,
        direction: Direction,
    ) -> CaprockResult<Option<usize>> {
        if params_index >= self.spec.param_count() {
            caprock_bail!(
                IndexOutOfRange: "vector position {} outside [0, {})",
                params_index,
                self.spec.param_count()
            );
        }
        Ok(self.steps.iter().position(|step| match direction {
            Direction::Greater => step.params[params_index] > limit,
            Direction::Less => step.params[params_index] < limit,
        }))
    }

    /// Per-well value, e.g. `well_value(3, "WOPR", "OP_1")`.
    pub fn well_value(&self, step_index: usize, keyword: &str, well: &str) -> CaprockResult<f64> {
        self.value(&self.joined(&[keyword, well]), step_index)
    }

    /// Per-group value.
    pub fn group_value(&self, step_index: usize, keyword: &str, group: &str) -> CaprockResult<f64> {
        self.value(&self.joined(&[keyword, group]), step_index)
    }

    /// Field-wide value.
    pub fn field_value(&self, step_index: usize, keyword: &str) -> CaprockResult<f64> {
        self.value(keyword, step_index)
    }

    /// Per-region value.
    pub fn region_value(
        &self,
        step_index: usize,
        keyword: &str,
        region: i32,
    ) -> CaprockResult<f64> {
        self.value(&self.joined(&[keyword, &region.to_string()]), step_index)
    }

    /// Per-cell value by 1-based coordinates.
    pub fn block_value(
        &self,
        step_index: usize,
        keyword: &str,
        (i, j, k): (i32, i32, i32),
    ) -> CaprockResult<f64> {
        self.value(&self.joined(&[keyword, &format!("{i},{j},{k}")]), step_index)
    }

    /// Per-segment value.
    pub fn segment_value(
        &self,
        step_index: usize,
        keyword: &str,
        well: &str,
        segment: i32,
    ) -> CaprockResult<f64> {
        self.value(
            &self.joined(&[keyword, well, &segment.to_string()]),
            step_index,
        )
    }

    /// Per-completion value by encoded cell number.
    pub fn completion_value(
        &self,
        step_index: usize,
        keyword: &str,
        well: &str,
        num: i32,
    ) -> CaprockResult<f64> {
        self.value(&self.joined(&[keyword, well, &num.to_string()]), step_index)
    }

    /// Unqualified value, e.g. `misc_value(3, "TIME")`.
    pub fn misc_value(&self, step_index: usize, keyword: &str) -> CaprockResult<f64> {
        self.value(keyword, step_index)
    }

    fn joined(&self, parts: &[&str]) -> String {
        parts.join(self.spec.join())
    }
}

/// Derive a step's clock from its payload: elapsed days when the case
/// carries a `TIME` vector, otherwise the rounded date vectors.
fn step_clock(
    spec: &SummarySpec,
    block: &caprock_records::Block,
    params: &[f64],
) -> CaprockResult<(f64, DateTime)> {
    if let Some(time_index) = spec.time_index() {
        let days = params[time_index];
        let elapsed = SignedDuration::try_from_secs_f64(days * SECONDS_PER_DAY)
            .map_err(|e| caprock_err!("bad elapsed time {} days: {}", days, e))?;
        let time = spec
            .start_date()
            .checked_add(elapsed)
            .map_err(|e| caprock_err!("elapsed time {} days overflows the clock: {}", days, e))?;
        return Ok((days, time));
    }
    if let Some((day, month, year)) = spec.date_indices() {
        let time = block.sim_time_summary(day, month, year)?;
        let days = time.duration_since(spec.start_date()).as_secs_f64() / SECONDS_PER_DAY;
        return Ok((days, time));
    }
    caprock_bail!(
        InvalidConfiguration: "case exposes no time axis: neither TIME nor DAY/MONTH/YEAR vectors"
    );
}
