//! Structural diff between two snapshots, for logging and scene notifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::world::{Position, Snapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    pub before: Value,
    pub after: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VariableDiff {
    pub changed: BTreeMap<String, ValueChange>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMove {
    pub from: Option<Position>,
    pub to: Option<Position>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EntityDiff {
    pub moved: BTreeMap<String, EntityMove>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StateDiff {
    pub variables: VariableDiff,
    pub entities: EntityDiff,
}

impl StateDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.changed.is_empty()
            && self.variables.added.is_empty()
            && self.variables.removed.is_empty()
            && self.entities.moved.is_empty()
            && self.entities.added.is_empty()
            && self.entities.removed.is_empty()
    }
}

#[must_use]
pub fn compute_state_diff(before: &Snapshot, after: &Snapshot) -> StateDiff {
    let mut diff = StateDiff::default();

    for (name, binding) in &after.variables {
        match before.variables.get(name) {
            None => diff.variables.added.push(name.clone()),
            Some(previous) if previous.value != binding.value => {
                diff.variables.changed.insert(
                    name.clone(),
                    ValueChange {
                        before: previous.value.clone(),
                        after: binding.value.clone(),
                    },
                );
            }
            Some(_) => {}
        }
    }
    diff.variables.removed = before
        .variables
        .keys()
        .filter(|name| !after.variables.contains_key(*name))
        .cloned()
        .collect();

    for (id, entity) in &after.entities {
        match before.entities.get(id) {
            None => diff.entities.added.push(id.clone()),
            Some(previous) if previous.position != entity.position => {
                diff.entities.moved.insert(
                    id.clone(),
                    EntityMove {
                        from: previous.position,
                        to: entity.position,
                    },
                );
            }
            Some(_) => {}
        }
    }
    diff.entities.removed = before
        .entities
        .keys()
        .filter(|id| !after.entities.contains_key(*id))
        .cloned()
        .collect();

    diff
}
