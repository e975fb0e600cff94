//! `// @key: value` annotation comments embedded in level code lines.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::{ExpectedCell, ExpectedState};
use super::infer::parse_value;
use crate::world::Position;

static ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"//\s*@(\w+):\s*(.+)").expect("annotation pattern"));
static EXPECTED_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"pos\(\s*([^)\s]+)\s*\)\s*=\s*(\d+)\s*,\s*(\d+)|cell\(\s*(\d+)\s*,\s*(\d+)\s*\)\s*=\s*([\w|-]*)|([A-Za-z_][\w\[\]]*)\s*=\s*([^,]+)",
    )
    .expect("expected-state pattern")
});

/// Explicit overrides found in a line's annotation comments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    pub operation: Option<String>,
    pub operands: Option<Map<String, Value>>,
    pub expected: Option<ExpectedState>,
    pub hint: Option<String>,
    pub custom: Map<String, Value>,
}

/// Split a raw line into its code and its annotations.
///
/// Malformed annotations simply do not match and stay in the code text.
#[must_use]
pub fn extract_annotations(raw: &str) -> (String, Annotations) {
    let mut annotations = Annotations::default();
    for caps in ANNOTATION.captures_iter(raw) {
        let key = &caps[1];
        let value = caps[2].trim();
        match key {
            "action" => annotations.operation = Some(value.to_string()),
            "operands" => annotations.operands = Some(parse_operands(value)),
            "expected" => annotations.expected = Some(parse_expected(value)),
            "hint" => annotations.hint = Some(value.to_string()),
            other => {
                annotations
                    .custom
                    .insert(other.to_string(), Value::String(value.to_string()));
            }
        }
    }
    let code = ANNOTATION.replace_all(raw, "").trim().to_string();
    (code, annotations)
}

/// Parse `k=v,k2=v2`. Pairs without `=` are skipped.
#[must_use]
pub fn parse_operands(raw: &str) -> Map<String, Value> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| (key.trim().to_string(), parse_value(value)))
        .collect()
}

/// Parse `x=5, pos(entity-x)=0,0, cell(1,2)=a|b`.
#[must_use]
pub fn parse_expected(raw: &str) -> ExpectedState {
    let mut expected = ExpectedState::default();
    for caps in EXPECTED_ITEM.captures_iter(raw) {
        if let (Some(id), Some(row), Some(col)) = (caps.get(1), caps.get(2), caps.get(3)) {
            if let (Ok(row), Ok(col)) = (row.as_str().parse(), col.as_str().parse()) {
                expected
                    .entities
                    .insert(id.as_str().to_string(), Position::new(row, col));
            }
        } else if let (Some(row), Some(col), Some(ids)) = (caps.get(4), caps.get(5), caps.get(6)) {
            if let (Ok(row), Ok(col)) = (row.as_str().parse(), col.as_str().parse()) {
                expected.grid.push(ExpectedCell {
                    row,
                    col,
                    entity_ids: ids
                        .as_str()
                        .split('|')
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect(),
                });
            }
        } else if let (Some(name), Some(value)) = (caps.get(7), caps.get(8)) {
            expected
                .variables
                .insert(name.as_str().to_string(), parse_value(value.as_str()));
        }
    }
    expected
}
