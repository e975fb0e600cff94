//! Tiered hints for the current line.
//!
//! Tier 0 names the operation, tier 1 is the authored hint, tier 2 spells out
//! what to do from the line's operands and expected state.

use serde_json::Value;
use std::fmt::Write as _;

use crate::constants::{HINT_FALLBACK, MAX_HINT_TIER};
use crate::level::{AnnotatedLine, Operation};
use crate::types::{CharacterTag, get_character_for_type};

/// Hint text for `tier`, clamped to `max_tier` (and never above 2).
#[must_use]
pub fn hint_for_tier(line: &AnnotatedLine, tier: u8, max_tier: u8) -> String {
    match tier.min(max_tier).min(MAX_HINT_TIER) {
        0 => nudge(line),
        1 if line.hint.trim().is_empty() => HINT_FALLBACK.to_string(),
        1 => line.hint.clone(),
        _ => explicit(line),
    }
}

fn nudge(line: &AnnotatedLine) -> String {
    match line.operation {
        Operation::Unknown => HINT_FALLBACK.to_string(),
        ref operation => format!("Line {} performs a `{operation}` operation.", line.line_number),
    }
}

fn show(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => match number.as_f64() {
            Some(float) if float.fract() == 0.0 && float.abs() < 1e15 => format!("{float:.0}"),
            _ => number.to_string(),
        },
        other => other.to_string(),
    }
}

fn explicit(line: &AnnotatedLine) -> String {
    let operand = |key: &str| line.operands.get(key).map(show);
    let name = |key: &str| operand(key).unwrap_or_else(|| "?".to_string());
    let unit_for = |fallback: CharacterTag| {
        line.operand_str("type")
            .map_or(fallback, get_character_for_type)
            .unit()
    };
    let expected_value = |variable: &str| {
        line.expected_state
            .as_ref()
            .and_then(|expected| expected.variables.get(variable))
            .map(show)
    };

    let mut text = match &line.operation {
        Operation::Declare => format!(
            "Place a {} for `{}` and give it the value {}.",
            unit_for(CharacterTag::Int),
            name("variable"),
            name("value")
        ),
        Operation::DeclareOnly => format!(
            "Place a {} for `{}`. It has no value yet.",
            unit_for(CharacterTag::Int),
            name("variable")
        ),
        Operation::PointerDeclare => match operand("target") {
            Some(target) => format!(
                "Place a {} for `{}` and aim it at `{target}`.",
                unit_for(CharacterTag::Pointer),
                name("pointer")
            ),
            None => format!(
                "Place a {} for `{}` holding {}.",
                unit_for(CharacterTag::Pointer),
                name("pointer"),
                name("value")
            ),
        },
        Operation::PointerDeclareOnly => format!(
            "Place a {} for `{}`. It does not point anywhere yet.",
            unit_for(CharacterTag::Pointer),
            name("pointer")
        ),
        Operation::ArrayDeclare => format!(
            "Build a {} named `{}` with {} slots.",
            CharacterTag::Array.unit(),
            name("array"),
            name("size")
        ),
        Operation::DerefWrite => format!(
            "Follow `{}` to the unit it points at and set its value to {}.",
            name("pointer"),
            name("value")
        ),
        Operation::DerefRead => format!(
            "Follow `{}` and copy the value it points at into `{}`.",
            name("pointer"),
            name("variable")
        ),
        Operation::ArrayAccess => format!(
            "Copy `{}[{}]` into `{}[{}]`.",
            name("sourceArray"),
            name("sourceIndex"),
            name("array"),
            name("destIndex")
        ),
        Operation::ArrayWrite => format!(
            "Set `{}[{}]` to {}.",
            name("array"),
            name("index"),
            name("value")
        ),
        Operation::Assign => match operand("target") {
            Some(target) => format!("Aim `{}` at `{target}`.", name("variable")),
            None => format!("Set `{}` to {}.", name("variable"), name("value")),
        },
        Operation::Increment | Operation::Decrement => {
            let variable = name("variable");
            let verb = if line.operation == Operation::Increment {
                "Add one to"
            } else {
                "Take one away from"
            };
            match expected_value(&variable) {
                Some(value) => format!("{verb} `{variable}` so it becomes {value}."),
                None => format!("{verb} `{variable}`."),
            }
        }
        Operation::Named(function) => {
            let args = line
                .operands
                .get("args")
                .and_then(Value::as_array)
                .map(|args| args.iter().map(show).collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            format!("Do what `{function}({args})` does to its arguments.")
        }
        Operation::Unknown => HINT_FALLBACK.to_string(),
    };

    if let Some(expected) = &line.expected_state {
        for (entity_id, position) in &expected.entities {
            let _ = write!(text, " Put `{entity_id}` at {position}.");
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::parse_code_line;

    #[test]
    fn tiers_escalate() {
        let line = parse_code_line("int x = 5; // @expected: x=5, pos(entity-x)=0,0", 0);
        assert_eq!(hint_for_tier(&line, 0, 2), "Line 1 performs a `declare` operation.");
        assert_eq!(hint_for_tier(&line, 1, 2), line.hint);
        assert_eq!(
            hint_for_tier(&line, 2, 2),
            "Place a catapult for `x` and give it the value 5. Put `entity-x` at (0, 0)."
        );
    }

    #[test]
    fn tier_is_clamped_by_config() {
        let line = parse_code_line("x++; // @hint: Bump it.", 0);
        assert_eq!(hint_for_tier(&line, 2, 1), "Bump it.");
        assert_eq!(hint_for_tier(&line, 9, 2), "Add one to `x`.");
    }

    #[test]
    fn explicit_hints_cover_pointers_and_arrays() {
        let pointer = parse_code_line("int *p = &x;", 0);
        assert_eq!(
            hint_for_tier(&pointer, 2, 2),
            "Place a ballista for `p` and aim it at `x`."
        );
        let copy = parse_code_line("arr[0] = arr[2];", 0);
        assert_eq!(hint_for_tier(&copy, 2, 2), "Copy `arr[2]` into `arr[0]`.");
        let unknown = parse_code_line("if (x > 0) {", 0);
        assert_eq!(hint_for_tier(&unknown, 0, 2), HINT_FALLBACK);
    }
}
