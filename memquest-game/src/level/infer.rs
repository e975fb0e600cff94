//! Ordered line classifier.
//!
//! Each rule is a pattern plus a builder. Rules are tried top to bottom and the
//! first match decides both the operation and the operand bundle, so a line
//! that matches an earlier rule never reaches a later one.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use super::Operation;
use crate::numbers::number_value;

static NUMERIC_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").expect("numeric literal pattern")
});
static ADDRESS_OF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^&\s*(\w+)(?:\s*\[\s*(\w+)\s*\])?$").expect("address-of pattern")
});

type Builder = fn(&Captures<'_>) -> (Operation, Map<String, Value>);

struct Rule {
    pattern: Regex,
    build: Builder,
}

impl Rule {
    fn new(pattern: &str, build: Builder) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("line rule pattern"),
            build,
        }
    }
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::new(
            r"^((?:\w+\s+)*?\w+)\s*(\*+)\s*(\w+)\s*=\s*([^;]+?)\s*;?$",
            build_pointer_declare,
        ),
        Rule::new(
            r"^((?:\w+\s+)*?\w+)\s*(\*+)\s*(\w+)\s*;?$",
            build_pointer_declare_only,
        ),
        Rule::new(
            r"^(?:((?:\w+\s+)*?\w+)\s+)?(\w+)\s*=\s*\*\s*(\w+)\s*;?$",
            build_deref_read,
        ),
        Rule::new(
            r"^((?:\w+\s+)*?\w+)\s+(\w+)\s*\[\s*(\d*)\s*\]\s*(?:=\s*\{([^}]*)\})?\s*;?$",
            build_array_declare,
        ),
        Rule::new(
            r"^((?:\w+\s+)*?\w+)\s+(\w+)\s*=\s*([^;]+?)\s*;?$",
            build_declare,
        ),
        Rule::new(r"^((?:\w+\s+)*?\w+)\s+(\w+)\s*;?$", build_declare_only),
        Rule::new(r"^\*\s*(\w+)\s*=\s*([^;]+?)\s*;?$", build_deref_write),
        Rule::new(
            r"^(\w+)\s*\[\s*(\w+)\s*\]\s*=\s*(\w+)\s*\[\s*(\w+)\s*\]\s*;?$",
            build_array_copy,
        ),
        Rule::new(
            r"^(\w+)\s*\[\s*(\w+)\s*\]\s*=\s*([^;]+?)\s*;?$",
            build_array_write,
        ),
        Rule::new(r"^(\w+)\s*=\s*([^;]+?)\s*;?$", build_assign),
        Rule::new(r"^(?:(\w+)\s*\+\+|\+\+\s*(\w+))\s*;?$", build_increment),
        Rule::new(r"^(?:(\w+)\s*--|--\s*(\w+))\s*;?$", build_decrement),
        Rule::new(r"^(\w+)\s*\(([^)]*)\)\s*;?$", build_call),
    ]
});

/// Operation and operands inferred from one line of code.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub operation: Operation,
    pub operands: Map<String, Value>,
}

/// Run the rule table against a line. Trailing `//` comments are ignored.
#[must_use]
pub fn classify(code: &str) -> Classified {
    let statement = strip_comment(code);
    for rule in RULES.iter() {
        if let Some(caps) = rule.pattern.captures(statement) {
            let (operation, operands) = (rule.build)(&caps);
            return Classified {
                operation,
                operands,
            };
        }
    }
    Classified {
        operation: Operation::Unknown,
        operands: Map::new(),
    }
}

#[must_use]
pub fn infer_operation(code: &str) -> Operation {
    classify(code).operation
}

#[must_use]
pub fn extract_operands(code: &str) -> Map<String, Value> {
    classify(code).operands
}

/// Parse a literal token.
///
/// Numbers become f64, `true`/`false` become booleans, quoted text loses its
/// quotes. Anything else (expressions, identifiers) comes back as the trimmed
/// token so callers always get a value.
#[must_use]
pub fn parse_value(raw: &str) -> Value {
    let token = raw.trim();
    if NUMERIC_LITERAL.is_match(token)
        && let Ok(number) = token.parse::<f64>()
    {
        return number_value(number);
    }
    match token {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Some(inner) = unquote(token) {
        return Value::String(inner.to_string());
    }
    Value::String(token.to_string())
}

fn unquote(token: &str) -> Option<&str> {
    if token.len() < 2 {
        return None;
    }
    let first = token.chars().next()?;
    let last = token.chars().last()?;
    if (first == '"' || first == '\'') && first == last {
        Some(&token[1..token.len() - 1])
    } else {
        None
    }
}

fn strip_comment(code: &str) -> &str {
    code.split("//").next().unwrap_or_default().trim()
}

fn text(value: &str) -> Value {
    Value::String(value.trim().to_string())
}

/// Record `target` (and `targetIndex`) when a value is an address-of expression.
fn insert_address_target(operands: &mut Map<String, Value>, raw: &str) {
    if let Some(caps) = ADDRESS_OF.captures(raw.trim()) {
        operands.insert("target".into(), text(&caps[1]));
        if let Some(index) = caps.get(2) {
            operands.insert("targetIndex".into(), parse_value(index.as_str()));
        }
    }
}

fn build_pointer_declare(caps: &Captures<'_>) -> (Operation, Map<String, Value>) {
    let mut operands = Map::new();
    operands.insert("pointer".into(), text(&caps[3]));
    operands.insert("type".into(), Value::String(format!("{}{}", caps[1].trim(), &caps[2])));
    operands.insert("value".into(), parse_value(&caps[4]));
    insert_address_target(&mut operands, &caps[4]);
    (Operation::PointerDeclare, operands)
}

fn build_pointer_declare_only(caps: &Captures<'_>) -> (Operation, Map<String, Value>) {
    let mut operands = Map::new();
    operands.insert("pointer".into(), text(&caps[3]));
    operands.insert("type".into(), Value::String(format!("{}{}", caps[1].trim(), &caps[2])));
    (Operation::PointerDeclareOnly, operands)
}

fn build_deref_read(caps: &Captures<'_>) -> (Operation, Map<String, Value>) {
    let mut operands = Map::new();
    operands.insert("variable".into(), text(&caps[2]));
    operands.insert("pointer".into(), text(&caps[3]));
    if let Some(var_type) = caps.get(1) {
        operands.insert("type".into(), text(var_type.as_str()));
    }
    (Operation::DerefRead, operands)
}

fn build_array_declare(caps: &Captures<'_>) -> (Operation, Map<String, Value>) {
    let mut operands = Map::new();
    let base_type = caps[1].trim();
    operands.insert("array".into(), text(&caps[2]));
    operands.insert("type".into(), Value::String(format!("{base_type}[]")));
    let values: Vec<Value> = caps
        .get(4)
        .map(|list| {
            list.as_str()
                .split(',')
                .filter(|item| !item.trim().is_empty())
                .map(parse_value)
                .collect()
        })
        .unwrap_or_default();
    let size = match caps[3].parse::<u64>() {
        Ok(size) => Value::from(size),
        Err(_) => Value::from(values.len()),
    };
    operands.insert("size".into(), size);
    if caps.get(4).is_some() {
        operands.insert("values".into(), Value::Array(values));
    }
    (Operation::ArrayDeclare, operands)
}

fn build_declare(caps: &Captures<'_>) -> (Operation, Map<String, Value>) {
    let mut operands = Map::new();
    operands.insert("variable".into(), text(&caps[2]));
    operands.insert("type".into(), text(&caps[1]));
    operands.insert("value".into(), parse_value(&caps[3]));
    (Operation::Declare, operands)
}

fn build_declare_only(caps: &Captures<'_>) -> (Operation, Map<String, Value>) {
    let mut operands = Map::new();
    operands.insert("variable".into(), text(&caps[2]));
    operands.insert("type".into(), text(&caps[1]));
    (Operation::DeclareOnly, operands)
}

fn build_deref_write(caps: &Captures<'_>) -> (Operation, Map<String, Value>) {
    let mut operands = Map::new();
    operands.insert("pointer".into(), text(&caps[1]));
    operands.insert("value".into(), parse_value(&caps[2]));
    (Operation::DerefWrite, operands)
}

fn build_array_copy(caps: &Captures<'_>) -> (Operation, Map<String, Value>) {
    let mut operands = Map::new();
    let dest = caps[1].trim();
    let source = caps[3].trim();
    operands.insert("array".into(), text(dest));
    operands.insert("destIndex".into(), parse_value(&caps[2]));
    operands.insert("sourceArray".into(), text(source));
    operands.insert("sourceIndex".into(), parse_value(&caps[4]));
    let mode = if dest == source { "copy" } else { "assign" };
    operands.insert("operation".into(), text(mode));
    (Operation::ArrayAccess, operands)
}

fn build_array_write(caps: &Captures<'_>) -> (Operation, Map<String, Value>) {
    let mut operands = Map::new();
    operands.insert("array".into(), text(&caps[1]));
    operands.insert("index".into(), parse_value(&caps[2]));
    operands.insert("value".into(), parse_value(&caps[3]));
    (Operation::ArrayWrite, operands)
}

fn build_assign(caps: &Captures<'_>) -> (Operation, Map<String, Value>) {
    let mut operands = Map::new();
    operands.insert("variable".into(), text(&caps[1]));
    operands.insert("value".into(), parse_value(&caps[2]));
    insert_address_target(&mut operands, &caps[2]);
    (Operation::Assign, operands)
}

fn step_variable(caps: &Captures<'_>) -> Map<String, Value> {
    let mut operands = Map::new();
    if let Some(name) = caps.get(1).or_else(|| caps.get(2)) {
        operands.insert("variable".into(), text(name.as_str()));
    }
    operands
}

fn build_increment(caps: &Captures<'_>) -> (Operation, Map<String, Value>) {
    (Operation::Increment, step_variable(caps))
}

fn build_decrement(caps: &Captures<'_>) -> (Operation, Map<String, Value>) {
    (Operation::Decrement, step_variable(caps))
}

fn build_call(caps: &Captures<'_>) -> (Operation, Map<String, Value>) {
    let function = caps[1].trim();
    let args: Vec<Value> = caps[2]
        .split(',')
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .map(|arg| Value::String(arg.to_string()))
        .collect();
    let mut operands = Map::new();
    operands.insert("function".into(), text(function));
    operands.insert("args".into(), Value::Array(args));
    (Operation::Named(function.to_lowercase()), operands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declaration_with_initializer_is_declare_not_assign() {
        let classified = classify("int x = 5;");
        assert_eq!(classified.operation, Operation::Declare);
        assert_eq!(classified.operands["variable"], json!("x"));
        assert_eq!(classified.operands["type"], json!("int"));
        assert_eq!(classified.operands["value"], json!(5.0));
    }

    #[test]
    fn declaration_without_initializer() {
        assert_eq!(infer_operation("char c;"), Operation::DeclareOnly);
        assert_eq!(infer_operation("int *p;"), Operation::PointerDeclareOnly);
    }

    #[test]
    fn pointer_declaration_records_target() {
        let classified = classify("int *p = &x;");
        assert_eq!(classified.operation, Operation::PointerDeclare);
        assert_eq!(classified.operands["pointer"], json!("p"));
        assert_eq!(classified.operands["type"], json!("int*"));
        assert_eq!(classified.operands["target"], json!("x"));
        assert_eq!(classified.operands["value"], json!("&x"));

        let element = classify("int *q = &arr[2];");
        assert_eq!(element.operands["target"], json!("arr"));
        assert_eq!(element.operands["targetIndex"], json!(2.0));
    }

    #[test]
    fn deref_read_wins_over_declaration() {
        let classified = classify("int v = *p;");
        assert_eq!(classified.operation, Operation::DerefRead);
        assert_eq!(classified.operands["variable"], json!("v"));
        assert_eq!(classified.operands["pointer"], json!("p"));
        assert_eq!(classified.operands["type"], json!("int"));

        let untyped = classify("v = *p;");
        assert_eq!(untyped.operation, Operation::DerefRead);
        assert!(!untyped.operands.contains_key("type"));
    }

    #[test]
    fn deref_write_is_detected() {
        let classified = classify("*p = 4;");
        assert_eq!(classified.operation, Operation::DerefWrite);
        assert_eq!(classified.operands["pointer"], json!("p"));
        assert_eq!(classified.operands["value"], json!(4.0));
    }

    #[test]
    fn array_declarations_capture_size_and_values() {
        let classified = classify("int arr[3] = {1, 2, 3};");
        assert_eq!(classified.operation, Operation::ArrayDeclare);
        assert_eq!(classified.operands["size"], json!(3));
        assert_eq!(classified.operands["values"], json!([1.0, 2.0, 3.0]));

        let implicit = classify("int nums[] = {4, 5};");
        assert_eq!(implicit.operands["size"], json!(2));

        let empty = classify("char buf[8];");
        assert_eq!(empty.operands["size"], json!(8));
        assert!(!empty.operands.contains_key("values"));
    }

    #[test]
    fn array_copy_mode_depends_on_names() {
        let same = classify("arr[1] = arr[3];");
        assert_eq!(same.operation, Operation::ArrayAccess);
        assert_eq!(same.operands["operation"], json!("copy"));
        assert_eq!(same.operands["destIndex"], json!(1.0));
        assert_eq!(same.operands["sourceIndex"], json!(3.0));

        let other = classify("a[0] = b[2];");
        assert_eq!(other.operands["operation"], json!("assign"));
        assert_eq!(other.operands["sourceArray"], json!("b"));
    }

    #[test]
    fn array_write_and_assign() {
        assert_eq!(infer_operation("arr[0] = 7;"), Operation::ArrayWrite);
        let assign = classify("p = &y;");
        assert_eq!(assign.operation, Operation::Assign);
        assert_eq!(assign.operands["target"], json!("y"));
        assert_eq!(classify("x = x + 1;").operands["value"], json!("x + 1"));
    }

    #[test]
    fn increments_and_decrements() {
        assert_eq!(infer_operation("x++;"), Operation::Increment);
        assert_eq!(classify("++count;").operands["variable"], json!("count"));
        assert_eq!(infer_operation("y--;"), Operation::Decrement);
        assert_eq!(classify("--y;").operands["variable"], json!("y"));
    }

    #[test]
    fn calls_use_lowercased_callee() {
        let classified = classify("Swap(&a, &b);");
        assert_eq!(classified.operation, Operation::Named("swap".into()));
        assert_eq!(classified.operands["function"], json!("Swap"));
        assert_eq!(classified.operands["args"], json!(["&a", "&b"]));
    }

    #[test]
    fn trailing_comments_are_ignored() {
        assert_eq!(infer_operation("int x = 5; // make x"), Operation::Declare);
    }

    #[test]
    fn unmatched_lines_are_unknown() {
        assert_eq!(infer_operation("for (;;) {"), Operation::Unknown);
        assert_eq!(infer_operation("}"), Operation::Unknown);
        assert!(extract_operands("}").is_empty());
    }

    #[test]
    fn parse_value_literals() {
        assert_eq!(parse_value("42"), json!(42.0));
        assert_eq!(parse_value(" -3.5 "), json!(-3.5));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("false"), json!(false));
        assert_eq!(parse_value("'a'"), json!("a"));
        assert_eq!(parse_value("\"hi\""), json!("hi"));
        assert_eq!(parse_value("x + 1"), json!("x + 1"));
        assert_eq!(parse_value("inf"), json!("inf"));
    }
}
