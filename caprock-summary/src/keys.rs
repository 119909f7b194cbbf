//! Compound lookup keys.
//!
//! A vector is addressed by a string key joining its keyword with the
//! components that pin it down: an owner name, a numeric locator,
//! grid-cell coordinates, a local-grid qualifier. The shape is fixed
//! per [`VarType`]; a key is silently not built when a required
//! component is absent, leaving the vector reachable by position only.

use crate::node::{SummaryNode, VarType};

/// Default separator between key components.
pub const DEFAULT_JOIN: &str = ":";

pub(crate) fn join_ijk((i, j, k): (i32, i32, i32)) -> String {
    format!("{i},{j},{k}")
}

fn join_parts(parts: &[Option<&str>], join: &str) -> Option<String> {
    let mut out = String::new();
    for part in parts {
        let part = (*part)?;
        if !out.is_empty() {
            out.push_str(join);
        }
        out.push_str(part);
    }
    Some(out)
}

/// Build the primary and, where applicable, secondary key of a node.
pub fn compute_keys(node: &SummaryNode, join: &str) -> (Option<String>, Option<String>) {
    let keyword = Some(node.keyword());
    let wgname = node.wgname();
    let num = node.num().map(|n| n.to_string());
    let num = num.as_deref();
    let ijk = node.ijk_string();
    let ijk = ijk.as_deref();
    let lgr = node.lgr_name();
    let lgr_ijk = node.lgr_ijk_string();
    let lgr_ijk = lgr_ijk.as_deref();

    match node.var_type() {
        VarType::Field | VarType::Misc => (keyword.map(str::to_string), None),
        VarType::Well | VarType::Group => (join_parts(&[keyword, wgname], join), None),
        VarType::Region => (join_parts(&[keyword, num], join), None),
        VarType::Segment => (join_parts(&[keyword, wgname, num], join), None),
        VarType::Block => (
            join_parts(&[keyword, num], join),
            join_parts(&[keyword, ijk], join),
        ),
        VarType::Completion => (
            join_parts(&[keyword, wgname, num], join),
            join_parts(&[keyword, wgname, ijk], join),
        ),
        VarType::LocalWell => (join_parts(&[keyword, lgr, wgname], join), None),
        VarType::LocalBlock => (join_parts(&[keyword, lgr, lgr_ijk], join), None),
        VarType::LocalCompletion => (join_parts(&[keyword, lgr, wgname, lgr_ijk], join), None),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::node::SummaryNode;
    use crate::spec::GridDims;

    fn dims() -> GridDims {
        GridDims::new(20, 10, 5)
    }

    fn node(
        keyword: &str,
        wgname: Option<&str>,
        num: Option<i32>,
        lgr: Option<&str>,
        lgr_ijk: Option<(i32, i32, i32)>,
    ) -> SummaryNode {
        SummaryNode::new(keyword, wgname, num, "SM3/DAY", lgr, lgr_ijk, &dims(), 0, ":")
            .unwrap()
            .unwrap()
    }

    #[rstest]
    #[case(node("FOPT", None, None, None, None), Some("FOPT"), None)]
    #[case(node("TIME", None, None, None, None), Some("TIME"), None)]
    #[case(node("WOPR", Some("OP_1"), None, None, None), Some("WOPR:OP_1"), None)]
    #[case(node("GGPR", Some("INJ"), None, None, None), Some("GGPR:INJ"), None)]
    #[case(node("RPR", None, Some(3), None, None), Some("RPR:3"), None)]
    #[case(node("SOFR", Some("OP_1"), Some(7), None, None), Some("SOFR:OP_1:7"), None)]
    // num 272 in a 20x10 grid is cell (12, 4, 2).
    #[case(node("BPR", None, Some(272), None, None), Some("BPR:272"), Some("BPR:12,4,2"))]
    #[case(
        node("CWIR", Some("OP_1"), Some(272), None, None),
        Some("CWIR:OP_1:272"),
        Some("CWIR:OP_1:12,4,2")
    )]
    #[case(
        node("LWOPR", Some("OP_1"), None, Some("LGR1"), None),
        Some("LWOPR:LGR1:OP_1"),
        None
    )]
    #[case(
        node("LBPR", None, None, Some("LGR1"), Some((2, 3, 4))),
        Some("LBPR:LGR1:2,3,4"),
        None
    )]
    #[case(
        node("LCWIR", Some("OP_1"), None, Some("LGR1"), Some((2, 3, 4))),
        Some("LCWIR:LGR1:OP_1:2,3,4"),
        None
    )]
    fn key_shapes(
        #[case] node: SummaryNode,
        #[case] primary: Option<&str>,
        #[case] secondary: Option<&str>,
    ) {
        assert_eq!(node.primary_key(), primary);
        assert_eq!(node.secondary_key(), secondary);
    }

    #[test]
    fn missing_component_builds_no_key() {
        // A region vector without its region number stays unindexed.
        let node = node("RPR", None, None, None, None);
        assert_eq!(node.primary_key(), None);
        assert_eq!(node.secondary_key(), None);
    }

    #[test]
    fn dummy_well_yields_no_node() {
        let skipped = SummaryNode::new(
            "WOPR",
            Some(crate::node::DUMMY_WELL),
            None,
            "SM3/DAY",
            None,
            None,
            &dims(),
            0,
            ":",
        )
        .unwrap();
        assert!(skipped.is_none());
    }

    #[test]
    fn custom_join_string() {
        let node = SummaryNode::new(
            "WOPR",
            Some("OP_1"),
            None,
            "SM3/DAY",
            None,
            None,
            &dims(),
            0,
            "--",
        )
        .unwrap()
        .unwrap();
        assert_eq!(node.primary_key(), Some("WOPR--OP_1"));
    }
}
