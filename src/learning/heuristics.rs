//! Structural heuristics for spotting spec tables and lists in page text
//!
//! The catalog is scanned in order and the first entry whose indicators are
//! present wins. Order is the tie-break, so more specific shapes come before
//! the generic ones.

/// One known page shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuralHeuristic {
    /// Becomes the pattern's `pattern_type`
    pub name: &'static str,
    /// Must appear; its position anchors the learned window
    pub start: &'static str,
    /// Must also appear somewhere in the text when set
    pub middle: Option<&'static str>,
    /// Bounds the window when found after `start`
    pub end: Option<&'static str>,
}

/// Known shapes, highest priority first. Indicators are lower-case ASCII.
pub const HEURISTICS: &[StructuralHeuristic] = &[
    StructuralHeuristic {
        name: "spine_chart",
        start: "spine chart",
        middle: Some("gpi"),
        end: Some("straightness"),
    },
    StructuralHeuristic {
        name: "markdown_spec_table",
        start: "| spine",
        middle: Some("| gpi"),
        end: None,
    },
    StructuralHeuristic {
        name: "generic_table",
        start: "spine",
        middle: Some("gpi"),
        end: Some("tolerance"),
    },
    StructuralHeuristic {
        name: "component_table",
        start: "point weight",
        middle: Some("insert"),
        end: Some("nock"),
    },
    // Generic fallbacks keyed on section headings
    StructuralHeuristic {
        name: "spec_list",
        start: "specifications",
        middle: None,
        end: Some("reviews"),
    },
    StructuralHeuristic {
        name: "tech_specs",
        start: "tech specs",
        middle: None,
        end: Some("reviews"),
    },
];

/// Where a heuristic's indicators were found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeuristicMatch {
    pub heuristic: &'static StructuralHeuristic,
    /// Byte offset of `start`
    pub start_pos: usize,
    /// Byte offset of `end`, when it occurs after `start`
    pub end_pos: Option<usize>,
}

/// First heuristic in `catalog` whose indicators all appear in `text_lower`.
///
/// `text_lower` must already be ASCII-lowercased so offsets line up with the
/// original content.
pub fn classify(
    text_lower: &str,
    catalog: &'static [StructuralHeuristic],
) -> Option<HeuristicMatch> {
    catalog.iter().find_map(|heuristic| {
        let start_pos = text_lower.find(heuristic.start)?;
        if let Some(middle) = heuristic.middle {
            if !text_lower.contains(middle) {
                return None;
            }
        }
        let end_pos = heuristic.end.and_then(|end| {
            let search_from = start_pos + heuristic.start.len();
            text_lower[search_from..].find(end).map(|p| search_from + p)
        });
        Some(HeuristicMatch {
            heuristic,
            start_pos,
            end_pos,
        })
    })
}
