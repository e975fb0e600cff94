//! Scene and initial-state generation from parsed snippet characters.
//!
//! Every character gets its own grid row. Scalars and pointers sit in column
//! zero; arrays expand left to right with one unit per element. The generated
//! [`InitialStateConfig`] uses the same `entity-{name}` ids the action handlers
//! look up, so a generated level is playable as is.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::constants::{DEFAULT_GRID_COLS, DEFAULT_GRID_ROWS, ENTITY_VALUE_KEY, META_POINTS_TO};
use crate::level::{
    CodeLineInput, GridConfig, InitialStateConfig, LevelConfig, VariableSeed, VariableSeedBinding,
};
use crate::snippet::{CharacterDescriptor, ParsedSnippet};
use crate::types::{CharacterTag, get_character_for_type};
use crate::world::{EntityDescriptor, EntityId, Position};

/// Renderable unit derived from one character (or one array element).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneObject {
    pub id: EntityId,
    pub label: String,
    pub variable: String,
    pub character: CharacterTag,
    pub unit: String,
    #[serde(rename = "type")]
    pub var_type: String,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_target: Option<EntityId>,
}

/// Post-condition a generated level checks against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ValidationHint {
    Value { variable: String, expected: Value },
    PointsTo { pointer: String, target: String },
    ArraySize { array: String, size: usize },
}

impl ValidationHint {
    #[must_use]
    pub fn variable(&self) -> &str {
        match self {
            ValidationHint::Value { variable, .. } => variable,
            ValidationHint::PointsTo { pointer, .. } => pointer,
            ValidationHint::ArraySize { array, .. } => array,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LevelData {
    pub scene_objects: Vec<SceneObject>,
    pub hints: Vec<ValidationHint>,
    pub grid: GridConfig,
    pub initial_state: InitialStateConfig,
    #[serde(default)]
    pub reference_code: Vec<String>,
}

impl LevelData {
    #[must_use]
    pub fn scene_object(&self, id: &str) -> Option<&SceneObject> {
        self.scene_objects.iter().find(|object| object.id == id)
    }

    /// Level configuration whose code lines are the snippet's reference code.
    #[must_use]
    pub fn into_level_config(self, id: impl Into<String>, title: impl Into<String>) -> LevelConfig {
        let code_snippet = self.reference_code.join("\n");
        LevelConfig {
            id: id.into(),
            title: Some(title.into()),
            code_snippet: Some(code_snippet),
            code_lines: self
                .reference_code
                .into_iter()
                .map(CodeLineInput::Raw)
                .collect(),
            initial_state: self.initial_state,
            ..LevelConfig::default()
        }
    }
}

#[must_use]
pub fn entity_id_for(name: &str) -> EntityId {
    format!("entity-{name}")
}

#[must_use]
pub fn element_id_for(array: &str, index: usize) -> EntityId {
    format!("entity-{array}-{index}")
}

fn element_type(array_type: &str) -> &str {
    array_type
        .split_once('[')
        .map_or(array_type, |(base, _)| base)
        .trim()
}

fn array_len(character: &CharacterDescriptor) -> usize {
    let listed = character
        .value
        .as_ref()
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    character.size.unwrap_or(listed).max(listed)
}

#[must_use]
pub fn generate_level_data(parsed: &ParsedSnippet) -> LevelData {
    let mut data = LevelData {
        reference_code: parsed.reference_code.clone(),
        ..LevelData::default()
    };
    let mut variables = BTreeMap::new();
    let mut widest = 1;

    for (row, character) in parsed.characters.iter().enumerate() {
        let tag = get_character_for_type(&character.char_type);
        match tag {
            CharacterTag::Array => {
                let len = array_len(character);
                widest = widest.max(len);
                expand_array(&mut data, character, row, len);
                variables.insert(
                    character.name.clone(),
                    VariableSeed::Binding(VariableSeedBinding {
                        var_type: character.char_type.clone(),
                        value: character.value.clone().unwrap_or(Value::Null),
                        bound_to: (len > 0).then(|| element_id_for(&character.name, 0)),
                    }),
                );
                data.hints.push(ValidationHint::ArraySize {
                    array: character.name.clone(),
                    size: len,
                });
            }
            _ => {
                let id = entity_id_for(&character.name);
                let link_target = character
                    .points_to
                    .as_deref()
                    .filter(|target| parsed.character(target).is_some())
                    .map(entity_id_for);
                let value = character.value.clone().or_else(|| {
                    character
                        .points_to
                        .as_ref()
                        .map(|target| Value::String(format!("&{target}")))
                });
                let position = Position::new(row, 0);

                let mut descriptor = EntityDescriptor::new(id.clone(), tag.unit()).at(position);
                if let Some(value) = &value {
                    descriptor = descriptor.with_variable(ENTITY_VALUE_KEY, value.clone());
                }
                if let Some(target) = &link_target {
                    descriptor
                        .metadata
                        .insert(META_POINTS_TO.to_string(), Value::String(target.clone()));
                }
                data.initial_state.entities.push(descriptor);

                variables.insert(
                    character.name.clone(),
                    VariableSeed::Binding(VariableSeedBinding {
                        var_type: character.char_type.clone(),
                        value: value.clone().unwrap_or(Value::Null),
                        bound_to: Some(link_target.clone().unwrap_or_else(|| id.clone())),
                    }),
                );

                if let Some(target) = &character.points_to {
                    data.hints.push(ValidationHint::PointsTo {
                        pointer: character.name.clone(),
                        target: target.clone(),
                    });
                } else if let Some(expected) = &character.value {
                    data.hints.push(ValidationHint::Value {
                        variable: character.name.clone(),
                        expected: expected.clone(),
                    });
                }

                data.scene_objects.push(SceneObject {
                    id,
                    label: character.name.clone(),
                    variable: character.name.clone(),
                    character: tag,
                    unit: tag.unit().to_string(),
                    var_type: character.char_type.clone(),
                    position,
                    value,
                    index: None,
                    link_target,
                });
            }
        }
    }

    data.grid = GridConfig {
        rows: parsed.characters.len().max(DEFAULT_GRID_ROWS),
        cols: widest.max(DEFAULT_GRID_COLS),
    };
    data.initial_state.grid = data.grid;
    data.initial_state.variables = variables;
    log::debug!(
        "generated {} scene objects and {} hints",
        data.scene_objects.len(),
        data.hints.len()
    );
    data
}

fn expand_array(data: &mut LevelData, character: &CharacterDescriptor, row: usize, len: usize) {
    let base_type = element_type(&character.char_type);
    let tag = get_character_for_type(base_type);
    let values = character.value.as_ref().and_then(Value::as_array);

    for index in 0..len {
        let id = element_id_for(&character.name, index);
        let position = Position::new(row, index);
        let value = values.and_then(|values| values.get(index)).cloned();

        let mut metadata = Map::new();
        metadata.insert("array".into(), Value::String(character.name.clone()));
        metadata.insert("index".into(), Value::from(index));
        let mut descriptor = EntityDescriptor::new(id.clone(), tag.unit()).at(position);
        descriptor.metadata = metadata;
        if let Some(value) = &value {
            descriptor = descriptor.with_variable(ENTITY_VALUE_KEY, value.clone());
        }
        data.initial_state.entities.push(descriptor);

        data.scene_objects.push(SceneObject {
            id,
            label: format!("{}[{index}]", character.name),
            variable: character.name.clone(),
            character: tag,
            unit: tag.unit().to_string(),
            var_type: base_type.to_string(),
            position,
            value,
            index: Some(index),
            link_target: None,
        });
    }
}
