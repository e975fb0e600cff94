//! Bounded inventory of placeable units with per-type cooldowns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrayItem {
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub added_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tray {
    slots: usize,
    items: Vec<TrayItem>,
    /// Cooldown expiry timestamps keyed by item type.
    cooldowns: BTreeMap<String, i64>,
}

impl Tray {
    #[must_use]
    pub fn new(slots: usize) -> Self {
        Self {
            slots,
            items: Vec::new(),
            cooldowns: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn slots(&self) -> usize {
        self.slots
    }

    #[must_use]
    pub fn items(&self) -> &[TrayItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.slots
    }

    pub(crate) fn push(&mut self, item: TrayItem) -> bool {
        if self.is_full() {
            return false;
        }
        self.items.push(item);
        true
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<TrayItem> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    #[must_use]
    pub fn find(&self, item_type: &str) -> Option<usize> {
        self.items.iter().position(|item| item.item_type == item_type)
    }

    pub(crate) fn set_cooldown(&mut self, item_type: &str, until: i64) {
        self.cooldowns.insert(item_type.to_string(), until);
    }

    /// Expired entries are dropped when checked.
    pub(crate) fn check_cooldown(&mut self, item_type: &str, now: i64) -> bool {
        match self.cooldowns.get(item_type) {
            Some(&until) if now < until => true,
            Some(_) => {
                self.cooldowns.remove(item_type);
                false
            }
            None => false,
        }
    }

    #[must_use]
    pub fn cooldowns(&self) -> &BTreeMap<String, i64> {
        &self.cooldowns
    }
}
