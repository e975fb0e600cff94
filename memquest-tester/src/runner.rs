use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use memquest_game::{GameStateManager, MemoryStore};

use crate::autoplay::{PlayReport, play_level};
use crate::scenario::{Scenario, ScenarioKind};

/// Actions an auto-played level may take before it is considered stuck.
const ACTIONS_PER_LINE: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none", skip_deserializing)]
    pub last_play: Option<PlayReport>,
}

pub struct ScenarioRunner {
    verbose: bool,
}

impl ScenarioRunner {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub async fn run(&self, scenario: &Scenario, iterations: usize) -> ScenarioResult {
        if self.verbose {
            println!("🧪 Running scenario: {}", scenario.key.bright_white());
        }

        let iterations = iterations.max(1);
        let mut failures = Vec::new();
        let mut performance_data = Vec::with_capacity(iterations);
        let mut successful_iterations = 0;
        let mut last_play = None;

        for iteration in 0..iterations {
            let started = Instant::now();
            let outcome = match &scenario.kind {
                ScenarioKind::Check(check) => check(),
                ScenarioKind::Playthrough(source) => match source.load() {
                    Ok(config) => {
                        let report = play_config(config).await;
                        let verdict = report_verdict(&report);
                        last_play = Some(report);
                        verdict
                    }
                    Err(err) => Err(err),
                },
            };
            performance_data.push(started.elapsed());

            match outcome {
                Ok(()) => successful_iterations += 1,
                Err(err) => {
                    log::debug!("{} iteration {iteration} failed: {err:#}", scenario.key);
                    failures.push(format!("iteration {}: {err:#}", iteration + 1));
                }
            }
        }

        let average_duration = average(&performance_data);
        ScenarioResult {
            scenario_name: scenario.key.clone(),
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations,
            failures,
            average_duration,
            performance_data,
            last_play,
        }
    }
}

async fn play_config(config: memquest_game::LevelConfig) -> PlayReport {
    let mut manager = GameStateManager::new(MemoryStore::new());
    let budget = match manager.load_level(config) {
        Ok(level) => level.line_count().max(1) * ACTIONS_PER_LINE,
        Err(err) => {
            return PlayReport {
                level_id: String::new(),
                line_count: 0,
                completed: false,
                actions: Vec::new(),
                stopped_reason: Some(err.to_string()),
            };
        }
    };
    play_level(&mut manager, budget).await
}

fn report_verdict(report: &PlayReport) -> anyhow::Result<()> {
    anyhow::ensure!(
        report.completed,
        "level {} stopped after {} actions: {}",
        report.level_id,
        report.actions.len(),
        report.stopped_reason.as_deref().unwrap_or("unknown reason")
    );
    anyhow::ensure!(
        report.failures() == 0,
        "level {} completed with {} rejected actions",
        report.level_id,
        report.failures()
    );
    Ok(())
}

fn average(durations: &[Duration]) -> Duration {
    let count = u32::try_from(durations.len()).unwrap_or(u32::MAX);
    if count == 0 {
        return Duration::ZERO;
    }
    durations.iter().sum::<Duration>() / count
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u64>::deserialize(deserializer)?;
        Ok(millis.into_iter().map(Duration::from_millis).collect())
    }
}
