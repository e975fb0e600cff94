use anyhow::{Context, Result};
use std::path::PathBuf;

use memquest_game::{LevelConfig, generate_level_data, parse_snippet};

pub mod catalog;

pub use catalog::{catalog_scenarios, find_scenario};

/// Levels shipped with the game crate.
pub const BUNDLED_LEVELS: [(&str, &str); 3] = [
    (
        "variables",
        include_str!("../../../memquest-game/data/levels/01-variables.json"),
    ),
    (
        "pointers",
        include_str!("../../../memquest-game/data/levels/02-pointers.json"),
    ),
    (
        "swap",
        include_str!("../../../memquest-game/data/levels/03-swap.json"),
    ),
];

/// Where a playthrough gets its level from.
#[derive(Debug, Clone)]
pub enum LevelSource {
    Bundled(&'static str),
    Snippet {
        id: &'static str,
        source: &'static str,
    },
    File(PathBuf),
}

impl LevelSource {
    pub fn load(&self) -> Result<LevelConfig> {
        match self {
            Self::Bundled(json) => {
                LevelConfig::from_json(json).context("bundled level is not valid JSON")
            }
            Self::Snippet { id, source } => {
                let parsed = parse_snippet(source);
                anyhow::ensure!(
                    !parsed.reference_code.is_empty(),
                    "snippet `{id}` has no statements"
                );
                Ok(generate_level_data(&parsed).into_level_config(*id, format!("Snippet {id}")))
            }
            Self::File(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                LevelConfig::from_json(&json)
                    .with_context(|| format!("{} is not a valid level", path.display()))
            }
        }
    }
}

pub type CheckFn = fn() -> Result<()>;

#[derive(Debug, Clone)]
pub enum ScenarioKind {
    /// Auto-play a level and require it to complete without a failed action.
    Playthrough(LevelSource),
    /// A scripted check against the game API.
    Check(CheckFn),
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub key: String,
    pub description: String,
    pub kind: ScenarioKind,
}

impl Scenario {
    #[must_use]
    pub fn playthrough(key: impl Into<String>, description: impl Into<String>, source: LevelSource) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            kind: ScenarioKind::Playthrough(source),
        }
    }

    #[must_use]
    pub fn check(key: impl Into<String>, description: impl Into<String>, check: CheckFn) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            kind: ScenarioKind::Check(check),
        }
    }
}

#[must_use]
pub fn list_scenarios() -> Vec<(String, String)> {
    catalog_scenarios()
        .into_iter()
        .map(|scenario| (scenario.key, scenario.description))
        .collect()
}

/// Resolve `all` and comma-separated keys. Unknown keys are returned separately.
#[must_use]
pub fn select_scenarios(keys: &[String]) -> (Vec<Scenario>, Vec<String>) {
    if keys.iter().any(|key| key == "all") {
        return (catalog_scenarios(), Vec::new());
    }
    let mut selected = Vec::new();
    let mut unknown = Vec::new();
    for key in keys {
        match find_scenario(key) {
            Some(scenario) => selected.push(scenario),
            None => unknown.push(key.clone()),
        }
    }
    (selected, unknown)
}
