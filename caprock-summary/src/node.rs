use caprock_error::CaprockResult;

use crate::keys::{compute_keys, join_ijk};
use crate::spec::GridDims;

/// Placeholder written by simulators into the well-name column of
/// vectors that have no owner. A vector carrying it never becomes a
/// node.
pub const DUMMY_WELL: &str = ":+:+:+:+";

/// The category of one summary vector, decided by its keyword's
/// leading characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    /// Per-well vector, e.g. `WOPR`.
    Well,
    /// Per-group vector, e.g. `GOPR`.
    Group,
    /// Field-wide vector, e.g. `FOPT`.
    Field,
    /// Per-region vector, e.g. `RPR`.
    Region,
    /// Per-cell vector, e.g. `BPR`.
    Block,
    /// Per-well-segment vector, e.g. `SOFR`.
    Segment,
    /// Per-completion vector, e.g. `CWIR`.
    Completion,
    /// Per-well vector inside a local grid.
    LocalWell,
    /// Per-cell vector inside a local grid.
    LocalBlock,
    /// Per-completion vector inside a local grid.
    LocalCompletion,
    /// Anything else: time bookkeeping, CPU counters and the like.
    Misc,
}

impl VarType {
    /// Classify a keyword. Total: every keyword classifies as
    /// something, with [`VarType::Misc`] as the fallback.
    pub fn from_keyword(keyword: &str) -> VarType {
        let mut chars = keyword.chars();
        match chars.next() {
            Some('W') => VarType::Well,
            Some('G') => VarType::Group,
            Some('F') => VarType::Field,
            Some('R') => VarType::Region,
            Some('B') => VarType::Block,
            Some('S') => VarType::Segment,
            Some('C') => VarType::Completion,
            Some('L') => match chars.next() {
                Some('W') => VarType::LocalWell,
                Some('B') => VarType::LocalBlock,
                Some('C') => VarType::LocalCompletion,
                _ => VarType::Misc,
            },
            _ => VarType::Misc,
        }
    }

    /// Whether this vector is owned by a named well or group.
    pub fn needs_wgname(&self) -> bool {
        matches!(
            self,
            VarType::Well
                | VarType::Group
                | VarType::Segment
                | VarType::Completion
                | VarType::LocalWell
                | VarType::LocalCompletion
        )
    }

    /// Whether this vector lives inside a local grid.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            VarType::LocalWell | VarType::LocalBlock | VarType::LocalCompletion
        )
    }
}

/// Flow-rate variable suffixes; matched against the keyword with its
/// owner-class prefix stripped, so `WOPR`, `GOPR` and `FOPR` all hit
/// `OPR`.
const RATE_SUFFIXES: [&str; 5] = ["OPR", "GPR", "WPR", "GOR", "WCT"];

/// Accumulated-quantity suffixes; only meaningful for well, group and
/// field vectors.
const TOTAL_SUFFIXES: [&str; 29] = [
    "OPT", "GPT", "WPT", "OPTF", "OPTS", "OIT", "OVPT", "OVIT", "MWT", "WIT", "WVPT", "WVIT",
    "GMT", "GPTF", "GIT", "SGT", "GST", "FGT", "GCT", "GIMT", "WGPT", "WGIT", "EGT", "EXGT",
    "GVPT", "GVIT", "LPT", "VPT", "VIT",
];

fn is_rate(keyword: &str) -> bool {
    keyword
        .get(1..)
        .is_some_and(|suffix| RATE_SUFFIXES.contains(&suffix))
}

fn is_total(keyword: &str, var_type: VarType) -> bool {
    match var_type {
        VarType::Well | VarType::Group | VarType::Field => keyword
            .get(1..)
            .is_some_and(|suffix| TOTAL_SUFFIXES.contains(&suffix)),
        _ => false,
    }
}

/// One described summary vector: identity, owner, location, unit and
/// flow classification, plus its position in every time step's
/// `PARAMS` payload.
#[derive(Debug, Clone)]
pub struct SummaryNode {
    var_type: VarType,
    keyword: String,
    unit: String,
    wgname: Option<String>,
    num: Option<i32>,
    ijk: Option<(i32, i32, i32)>,
    lgr_name: Option<String>,
    lgr_ijk: Option<(i32, i32, i32)>,
    is_rate: bool,
    is_total: bool,
    params_index: usize,
    primary_key: Option<String>,
    secondary_key: Option<String>,
}

impl SummaryNode {
    /// Build the node for one header column. Returns `None` when the
    /// vector's owner column holds the reserved placeholder, meaning
    /// the column is dead space in the payload.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        keyword: &str,
        wgname: Option<&str>,
        num: Option<i32>,
        unit: &str,
        lgr_name: Option<&str>,
        lgr_ijk: Option<(i32, i32, i32)>,
        dims: &GridDims,
        params_index: usize,
        join: &str,
    ) -> CaprockResult<Option<SummaryNode>> {
        let var_type = VarType::from_keyword(keyword);
        if var_type.needs_wgname() && wgname.is_none_or(|name| name == DUMMY_WELL) {
            return Ok(None);
        }

        let ijk = match (var_type, num) {
            (VarType::Block | VarType::Completion, Some(num)) => Some(dims.decode_cell(num)?),
            _ => None,
        };
        let mut node = SummaryNode {
            var_type,
            keyword: keyword.to_string(),
            unit: unit.to_string(),
            wgname: wgname.map(str::to_string),
            num,
            ijk,
            lgr_name: lgr_name.map(str::to_string),
            lgr_ijk,
            is_rate: is_rate(keyword),
            is_total: is_total(keyword, var_type),
            params_index,
            primary_key: None,
            secondary_key: None,
        };
        node.recompute_keys(join);
        Ok(Some(node))
    }

    fn recompute_keys(&mut self, join: &str) {
        let (primary, secondary) = compute_keys(self, join);
        self.primary_key = primary;
        self.secondary_key = secondary;
    }

    /// The vector category.
    pub fn var_type(&self) -> VarType {
        self.var_type
    }

    /// The variable keyword, e.g. `WOPR`.
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// The unit string from the header.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// The owning well or group name, when the category has one.
    pub fn wgname(&self) -> Option<&str> {
        self.wgname.as_deref()
    }

    /// The numeric locator: region id, segment number or encoded cell.
    pub fn num(&self) -> Option<i32> {
        self.num
    }

    /// The 1-based cell coordinates for block and completion vectors.
    pub fn ijk(&self) -> Option<(i32, i32, i32)> {
        self.ijk
    }

    /// The local grid this vector lives in, if any.
    pub fn lgr_name(&self) -> Option<&str> {
        self.lgr_name.as_deref()
    }

    /// The 1-based cell coordinates within the local grid.
    pub fn lgr_ijk(&self) -> Option<(i32, i32, i32)> {
        self.lgr_ijk
    }

    /// Whether the vector is an instantaneous flow rate.
    pub fn is_rate(&self) -> bool {
        self.is_rate
    }

    /// Whether the vector is an accumulated quantity.
    pub fn is_total(&self) -> bool {
        self.is_total
    }

    /// Position of this vector's value in each step's payload.
    pub fn params_index(&self) -> usize {
        self.params_index
    }

    /// The canonical lookup key, e.g. `WOPR:OP_1`. Absent when a
    /// required component is missing.
    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// The alternative key carried by cell-addressed vectors, e.g.
    /// `BPR:12,4,1`.
    pub fn secondary_key(&self) -> Option<&str> {
        self.secondary_key.as_deref()
    }

    /// Rebind the owning well or group to a new name and rebuild the
    /// keys, e.g. when a well is renamed mid-history.
    pub fn rebind_wgname(&mut self, wgname: &str, join: &str) {
        self.wgname = Some(wgname.to_string());
        self.recompute_keys(join);
    }

    pub(crate) fn ijk_string(&self) -> Option<String> {
        self.ijk.map(join_ijk)
    }

    pub(crate) fn lgr_ijk_string(&self) -> Option<String> {
        self.lgr_ijk.map(join_ijk)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{VarType, is_rate, is_total};

    #[rstest]
    #[case("WOPR", VarType::Well)]
    #[case("GGPR", VarType::Group)]
    #[case("FOPT", VarType::Field)]
    #[case("RPR", VarType::Region)]
    #[case("BPR", VarType::Block)]
    #[case("SOFR", VarType::Segment)]
    #[case("CWIR", VarType::Completion)]
    #[case("LWOPR", VarType::LocalWell)]
    #[case("LBPR", VarType::LocalBlock)]
    #[case("LCWIR", VarType::LocalCompletion)]
    #[case("TIME", VarType::Misc)]
    #[case("", VarType::Misc)]
    fn keyword_classification(#[case] keyword: &str, #[case] expected: VarType) {
        assert_eq!(VarType::from_keyword(keyword), expected);
    }

    #[rstest]
    #[case("WOPR", true)]
    #[case("GGOR", true)]
    #[case("FWCT", true)]
    #[case("WOPT", false)]
    #[case("TIME", false)]
    fn rate_classification(#[case] keyword: &str, #[case] expected: bool) {
        assert_eq!(is_rate(keyword), expected);
    }

    #[rstest]
    #[case("WOPT", VarType::Well, true)]
    #[case("FGPT", VarType::Field, true)]
    #[case("GWGIT", VarType::Group, true)]
    #[case("WOPR", VarType::Well, false)]
    // Only well, group and field vectors accumulate.
    #[case("ROPT", VarType::Region, false)]
    fn total_classification(
        #[case] keyword: &str,
        #[case] var_type: VarType,
        #[case] expected: bool,
    ) {
        assert_eq!(is_total(keyword, var_type), expected);
    }
}
