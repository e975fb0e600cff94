//! Level loading and code-line annotation.
//!
//! A level arrives as JSON-shaped configuration. Every code line is either a
//! raw string, which is annotated from its comments and its shape, or an object
//! whose explicit fields are trusted and whose gaps are filled by inference.

pub mod annotate;
pub mod infer;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::{DEFAULT_GRID_COLS, DEFAULT_GRID_ROWS, DEFAULT_TRAY_SLOTS};
use crate::types::get_character_for_type;
use crate::world::{EntityDescriptor, Position};

pub use annotate::{Annotations, extract_annotations, parse_expected, parse_operands};
pub use infer::{Classified, classify, extract_operands, infer_operation, parse_value};

/// Semantic operation performed by one code line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum Operation {
    Declare,
    DeclareOnly,
    PointerDeclare,
    PointerDeclareOnly,
    ArrayDeclare,
    DerefWrite,
    DerefRead,
    ArrayAccess,
    ArrayWrite,
    Assign,
    Increment,
    Decrement,
    /// Function calls (lower-cased callee) and authored custom operations.
    Named(String),
    #[default]
    Unknown,
}

impl Operation {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Operation::Declare => "declare",
            Operation::DeclareOnly => "declare_only",
            Operation::PointerDeclare => "pointer_declare",
            Operation::PointerDeclareOnly => "pointer_declare_only",
            Operation::ArrayDeclare => "array_declare",
            Operation::DerefWrite => "deref_write",
            Operation::DerefRead => "deref_read",
            Operation::ArrayAccess => "array_access",
            Operation::ArrayWrite => "array_write",
            Operation::Assign => "assign",
            Operation::Increment => "increment",
            Operation::Decrement => "decrement",
            Operation::Named(name) => name,
            Operation::Unknown => "unknown",
        }
    }

    /// True for lines that introduce a new variable.
    #[must_use]
    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            Operation::Declare
                | Operation::DeclareOnly
                | Operation::PointerDeclare
                | Operation::PointerDeclareOnly
                | Operation::ArrayDeclare
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "declare" => Operation::Declare,
            "declare_only" => Operation::DeclareOnly,
            "pointer_declare" => Operation::PointerDeclare,
            "pointer_declare_only" => Operation::PointerDeclareOnly,
            "array_declare" => Operation::ArrayDeclare,
            "deref_write" => Operation::DerefWrite,
            "deref_read" => Operation::DerefRead,
            "array_access" => Operation::ArrayAccess,
            "array_write" => Operation::ArrayWrite,
            "assign" => Operation::Assign,
            "increment" => Operation::Increment,
            "decrement" => Operation::Decrement,
            "unknown" | "" => Operation::Unknown,
            other => Operation::Named(other.to_string()),
        })
    }
}

impl From<String> for Operation {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(operation) => operation,
            Err(never) => match never {},
        }
    }
}

impl From<Operation> for String {
    fn from(value: Operation) -> Self {
        value.as_str().to_string()
    }
}

/// Cell contents a line expects after it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedCell {
    pub row: usize,
    pub col: usize,
    #[serde(default)]
    pub entity_ids: Vec<String>,
}

/// Partial post-condition for a line. Only listed keys are checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedState {
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    #[serde(default)]
    pub entities: BTreeMap<String, Position>,
    #[serde(default)]
    pub grid: Vec<ExpectedCell>,
}

impl ExpectedState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.entities.is_empty() && self.grid.is_empty()
    }
}

/// A code line enriched with its operation, operands, post-condition and hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedLine {
    pub line_number: usize,
    pub code: String,
    pub operation: Operation,
    #[serde(default)]
    pub operands: Map<String, Value>,
    #[serde(default)]
    pub expected_state: Option<ExpectedState>,
    #[serde(default)]
    pub hint: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AnnotatedLine {
    /// String operand lookup.
    #[must_use]
    pub fn operand_str(&self, key: &str) -> Option<&str> {
        self.operands.get(key).and_then(Value::as_str)
    }
}

/// Caller-supplied line object. Present fields win over inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedLineOverride {
    pub code: String,
    #[serde(default)]
    pub line_number: Option<usize>,
    #[serde(default)]
    pub operation: Option<Operation>,
    #[serde(default)]
    pub operands: Option<Map<String, Value>>,
    #[serde(default)]
    pub expected_state: Option<ExpectedState>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// One entry of `codeLines`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeLineInput {
    Raw(String),
    Annotated(AnnotatedLineOverride),
}

impl From<&str> for CodeLineInput {
    fn from(value: &str) -> Self {
        CodeLineInput::Raw(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "GridConfig::default_rows")]
    pub rows: usize,
    #[serde(default = "GridConfig::default_cols")]
    pub cols: usize,
}

impl GridConfig {
    const fn default_rows() -> usize {
        DEFAULT_GRID_ROWS
    }

    const fn default_cols() -> usize {
        DEFAULT_GRID_COLS
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_GRID_ROWS,
            cols: DEFAULT_GRID_COLS,
        }
    }
}

/// Tray item as written in level files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrayItemSeed {
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TraySeed {
    #[serde(default)]
    pub items: Vec<TrayItemSeed>,
}

/// Fully specified initial variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VariableSeedBinding {
    #[serde(rename = "type")]
    pub var_type: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub bound_to: Option<String>,
}

/// Initial variable: either a binding object or a bare value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableSeed {
    Binding(VariableSeedBinding),
    Plain(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InitialStateConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub entities: Vec<EntityDescriptor>,
    #[serde(default)]
    pub variables: BTreeMap<String, VariableSeed>,
    #[serde(default)]
    pub tray: TraySeed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrayConfig {
    #[serde(default = "TrayConfig::default_slots")]
    pub slots: usize,
    #[serde(default)]
    pub items: Vec<TrayItemSeed>,
}

impl TrayConfig {
    const fn default_slots() -> usize {
        DEFAULT_TRAY_SLOTS
    }
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            slots: DEFAULT_TRAY_SLOTS,
            items: Vec::new(),
        }
    }
}

/// Raw level configuration as authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LevelConfig {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub code_snippet: Option<String>,
    #[serde(default)]
    pub code_lines: Vec<CodeLineInput>,
    #[serde(default)]
    pub initial_state: InitialStateConfig,
    #[serde(default)]
    pub tray_config: TrayConfig,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl LevelConfig {
    /// Parse level configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not match the level schema.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Minimal configuration from raw code lines.
    #[must_use]
    pub fn from_lines<I, S>(id: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            code_lines: lines
                .into_iter()
                .map(|line| CodeLineInput::Raw(line.into()))
                .collect(),
            ..Self::default()
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "level id must be a string or number, got {other}"
        ))),
    }
}

/// Normalized, immutable level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub id: String,
    pub title: String,
    pub description: String,
    pub code_snippet: String,
    pub code_lines: Vec<AnnotatedLine>,
    pub initial_state: InitialStateConfig,
    pub tray_config: TrayConfig,
    pub metadata: Map<String, Value>,
}

impl Level {
    #[must_use]
    pub fn line(&self, index: usize) -> Option<&AnnotatedLine> {
        self.code_lines.get(index)
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.code_lines.len()
    }
}

/// Normalize a level configuration, annotating every code line.
#[must_use]
pub fn load_level(config: LevelConfig) -> Level {
    let code_lines = parse_code_lines(&config.code_lines);
    let code_snippet = config.code_snippet.unwrap_or_else(|| {
        code_lines
            .iter()
            .map(|line| line.code.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    });
    log::info!(
        "loaded level {} with {} code lines",
        config.id,
        code_lines.len()
    );
    Level {
        title: config
            .title
            .unwrap_or_else(|| format!("Level {}", config.id)),
        description: config.description.unwrap_or_default(),
        code_snippet,
        code_lines,
        initial_state: config.initial_state,
        tray_config: config.tray_config,
        metadata: config.metadata,
        id: config.id,
    }
}

/// Annotate a list of raw or pre-built lines.
#[must_use]
pub fn parse_code_lines(raw_lines: &[CodeLineInput]) -> Vec<AnnotatedLine> {
    raw_lines
        .iter()
        .enumerate()
        .map(|(index, input)| match input {
            CodeLineInput::Raw(code) => parse_code_line(code, index),
            CodeLineInput::Annotated(line) => merge_override(line, index),
        })
        .collect()
}

fn merge_override(line: &AnnotatedLineOverride, index: usize) -> AnnotatedLine {
    let mut inferred = parse_code_line(&line.code, index);
    if let Some(number) = line.line_number {
        inferred.line_number = number;
    }
    if let Some(operation) = &line.operation {
        inferred.operation = operation.clone();
    }
    if let Some(operands) = &line.operands {
        for (key, value) in operands {
            inferred.operands.insert(key.clone(), value.clone());
        }
    }
    if line.expected_state.is_some() {
        inferred.expected_state = line.expected_state.clone();
    }
    if let Some(hint) = &line.hint {
        inferred.hint = hint.clone();
    }
    if let Some(metadata) = &line.metadata {
        for (key, value) in metadata {
            inferred.metadata.insert(key.clone(), value.clone());
        }
    }
    inferred
}

/// Annotate a single raw line. `index` is zero-based; line numbers are one-based.
#[must_use]
pub fn parse_code_line(raw: &str, index: usize) -> AnnotatedLine {
    let (code, annotations) = extract_annotations(raw);
    let classified = classify(&code);
    let operation = annotations
        .operation
        .map_or(classified.operation, Operation::from);
    let operands = annotations.operands.unwrap_or(classified.operands);
    let hint = annotations
        .hint
        .unwrap_or_else(|| default_hint(&operation, &operands));
    AnnotatedLine {
        line_number: index + 1,
        code,
        operation,
        operands,
        expected_state: annotations.expected,
        hint,
        metadata: annotations.custom,
    }
}

/// Hint used when a line has none authored.
#[must_use]
pub fn default_hint(operation: &Operation, operands: &Map<String, Value>) -> String {
    let name = |key: &str| {
        operands
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("the variable")
            .to_string()
    };
    let unit = || {
        let var_type = operands.get("type").and_then(Value::as_str).unwrap_or("int");
        get_character_for_type(var_type).unit()
    };
    match operation {
        Operation::Declare | Operation::DeclareOnly => {
            format!("Place a {} to create `{}`.", unit(), name("variable"))
        }
        Operation::PointerDeclare | Operation::PointerDeclareOnly => {
            format!("Place a {} to create pointer `{}`.", unit(), name("pointer"))
        }
        Operation::ArrayDeclare => format!("Build a {} for `{}`.", unit(), name("array")),
        Operation::DerefWrite => format!("Follow `{}` and change what it points at.", name("pointer")),
        Operation::DerefRead => format!(
            "Follow `{}` and copy what it points at into `{}`.",
            name("pointer"),
            name("variable")
        ),
        Operation::ArrayAccess | Operation::ArrayWrite => {
            format!("Work with one slot of `{}`.", name("array"))
        }
        Operation::Assign => format!("Give `{}` its new value.", name("variable")),
        Operation::Increment => format!("Add one to `{}`.", name("variable")),
        Operation::Decrement => format!("Take one away from `{}`.", name("variable")),
        Operation::Named(function) => format!("Carry out what `{function}` does."),
        Operation::Unknown => String::from("Think about what this line does to memory."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_level_fills_defaults() {
        let level = load_level(LevelConfig::from_lines("7", ["int x = 5;", "x++;"]));
        assert_eq!(level.title, "Level 7");
        assert_eq!(level.description, "");
        assert_eq!(level.code_snippet, "int x = 5;\nx++;");
        assert_eq!(level.initial_state.grid, GridConfig::default());
        assert_eq!(level.tray_config.slots, 5);
        assert_eq!(level.line_count(), 2);
        assert_eq!(level.line(1).unwrap().line_number, 2);
    }

    #[test]
    fn raw_lines_use_annotations_before_inference() {
        let line = parse_code_line(
            "int x = 5; // @expected: x=5, pos(entity-x)=0,0",
            0,
        );
        assert_eq!(line.code, "int x = 5;");
        assert_eq!(line.operation, Operation::Declare);
        let expected = line.expected_state.unwrap();
        assert_eq!(expected.variables["x"], json!(5.0));
        assert_eq!(expected.entities["entity-x"], Position::new(0, 0));
        assert!(line.hint.contains("catapult"));
    }

    #[test]
    fn annotated_action_overrides_inferred_operation() {
        let line = parse_code_line("x = 3; // @action: teleport", 0);
        assert_eq!(line.operation, Operation::Named("teleport".into()));
        assert_eq!(line.operands["variable"], json!("x"));
    }

    #[test]
    fn object_lines_keep_supplied_fields_and_fill_gaps() {
        let config = LevelConfig::from_json(
            r#"{
                "id": 3,
                "codeLines": [
                    {"code": "int x = 5;", "hint": "custom", "operands": {"value": 6}},
                    "x++;"
                ]
            }"#,
        )
        .unwrap();
        let level = load_level(config);
        assert_eq!(level.id, "3");
        let first = &level.code_lines[0];
        assert_eq!(first.hint, "custom");
        assert_eq!(first.operation, Operation::Declare);
        assert_eq!(first.operands["value"], json!(6));
        assert_eq!(first.operands["variable"], json!("x"));
        assert_eq!(level.code_lines[1].operation, Operation::Increment);
    }

    #[test]
    fn initial_state_accepts_plain_and_bound_variables() {
        let config = LevelConfig::from_json(
            r#"{
                "id": "vars",
                "initialState": {
                    "grid": {"rows": 3},
                    "entities": [{"id": "a", "type": "catapult", "position": {"row": 0, "col": 1}}],
                    "variables": {
                        "x": 4,
                        "p": {"type": "int*", "value": "&x", "boundTo": "a"}
                    },
                    "tray": {"items": [{"type": "catapult"}]}
                },
                "trayConfig": {"slots": 2}
            }"#,
        )
        .unwrap();
        assert_eq!(config.initial_state.grid.rows, 3);
        assert_eq!(config.initial_state.grid.cols, 8);
        assert!(matches!(
            config.initial_state.variables["x"],
            VariableSeed::Plain(_)
        ));
        match &config.initial_state.variables["p"] {
            VariableSeed::Binding(binding) => {
                assert_eq!(binding.bound_to.as_deref(), Some("a"));
            }
            VariableSeed::Plain(_) => panic!("expected binding"),
        }
        assert_eq!(config.tray_config.slots, 2);
    }

    #[test]
    fn operation_round_trips_through_strings() {
        for op in [
            Operation::Declare,
            Operation::PointerDeclareOnly,
            Operation::ArrayAccess,
            Operation::Named("printf".into()),
            Operation::Unknown,
        ] {
            let as_string = String::from(op.clone());
            assert_eq!(Operation::from(as_string), op);
        }
        assert_eq!(serde_json::to_value(Operation::DerefWrite).unwrap(), json!("deref_write"));
    }
}
