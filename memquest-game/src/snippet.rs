//! Rule-based snippet parser producing character descriptors.
//!
//! Each statement line is classified with the level rule table. Declarations
//! create characters; later assignments, pointer writes and steps update the
//! character they name. Lines that are not statements (braces, function
//! headers, preprocessor lines, `return`) are dropped from the reference code.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::level::{Operation, classify};
use crate::numbers::{number_value, value_as_f64, value_as_index};
use crate::types::{DeclarationKind, parse_type_declaration};

static SKIPPED_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[{}]+;?|#.*|return\b.*|(?:\w+\s+)+\**\w+\s*\([^)]*\)\s*\{?)$")
        .expect("skipped line pattern")
});

/// One variable of the snippet, in the external descriptor format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub char_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSnippet {
    pub reference_code: Vec<String>,
    pub characters: Vec<CharacterDescriptor>,
}

impl ParsedSnippet {
    #[must_use]
    pub fn character(&self, name: &str) -> Option<&CharacterDescriptor> {
        self.characters.iter().find(|character| character.name == name)
    }

    fn character_mut(&mut self, name: &str) -> Option<&mut CharacterDescriptor> {
        self.characters
            .iter_mut()
            .find(|character| character.name == name)
    }
}

#[must_use]
pub fn parse_snippet(source: &str) -> ParsedSnippet {
    let mut parsed = ParsedSnippet::default();
    for raw in source.lines() {
        let code = raw.split("//").next().unwrap_or_default().trim();
        if code.is_empty() || SKIPPED_LINE.is_match(code) {
            continue;
        }
        parsed.reference_code.push(code.to_string());
        apply_statement(&mut parsed, code);
    }
    parsed
}

fn apply_statement(parsed: &mut ParsedSnippet, code: &str) {
    let classified = classify(code);
    let operands = &classified.operands;
    let text = |key: &str| operand_str(operands, key);

    match &classified.operation {
        operation if operation.is_declaration() => {
            let Some(declaration) = parse_type_declaration(code) else {
                return;
            };
            if parsed.character(&declaration.name).is_some() {
                log::debug!("snippet redeclares `{}`, keeping the first", declaration.name);
                return;
            }
            let (size, value) = match declaration.kind {
                DeclarationKind::Array { size } => (
                    size.or_else(|| operands.get("size").and_then(value_as_index)),
                    operands.get("values").cloned(),
                ),
                _ => (None, operands.get("value").cloned()),
            };
            parsed.characters.push(CharacterDescriptor {
                name: declaration.name.clone(),
                char_type: declaration.full_type(),
                size,
                value,
                points_to: text("target").map(str::to_string),
            });
        }
        Operation::Assign => {
            let Some(name) = text("variable") else {
                return;
            };
            let target = text("target").map(str::to_string);
            let value = operands.get("value").cloned();
            if let Some(character) = parsed.character_mut(name) {
                if target.is_some() {
                    character.points_to = target;
                }
                character.value = value;
            }
        }
        Operation::DerefRead => {
            let Some(name) = text("variable") else {
                return;
            };
            let value = text("pointer")
                .and_then(|pointer| parsed.character(pointer))
                .and_then(|pointer| pointer.points_to.as_deref())
                .and_then(|pointee| parsed.character(pointee))
                .and_then(|pointee| pointee.value.clone());
            if let Some(character) = parsed.character_mut(name) {
                character.value = value;
            } else if let Some(var_type) = text("type") {
                parsed.characters.push(CharacterDescriptor {
                    name: name.to_string(),
                    char_type: var_type.to_string(),
                    size: None,
                    value,
                    points_to: None,
                });
            }
        }
        Operation::DerefWrite => {
            let pointee = text("pointer")
                .and_then(|pointer| parsed.character(pointer))
                .and_then(|pointer| pointer.points_to.clone());
            let value = operands.get("value").cloned();
            if let Some(character) = pointee.and_then(|name| parsed.character_mut(&name)) {
                character.value = value;
            }
        }
        Operation::ArrayWrite => {
            let index = operands.get("index").and_then(value_as_index);
            let value = operands.get("value").cloned();
            if let (Some(name), Some(index), Some(value)) = (text("array"), index, value)
                && let Some(Value::Array(items)) = parsed
                    .character_mut(name)
                    .and_then(|character| character.value.as_mut())
                && let Some(slot) = items.get_mut(index)
            {
                *slot = value;
            }
        }
        Operation::Increment | Operation::Decrement => {
            let delta = if classified.operation == Operation::Increment {
                1.0
            } else {
                -1.0
            };
            if let Some(character) = text("variable").and_then(|name| parsed.character_mut(name))
                && let Some(current) = character.value.as_ref().and_then(value_as_f64)
            {
                character.value = Some(number_value(current + delta));
            }
        }
        _ => {}
    }
}

fn operand_str<'a>(operands: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    operands.get(key).and_then(Value::as_str)
}
