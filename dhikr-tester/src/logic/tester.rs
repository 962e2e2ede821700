use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::assets::TesterAssets;
use super::scenarios::{RunOutcome, Scenario, ScenarioPlan};
use super::simulation::{run_calendar, run_session};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

pub struct LogicTester {
    assets: TesterAssets,
    verbose: bool,
}

impl LogicTester {
    pub const fn new(assets: TesterAssets, verbose: bool) -> Self {
        Self { assets, verbose }
    }

    pub fn run_scenario(
        &self,
        scenario: &Scenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (seed: {seed})",
                    scenario.name.bright_white()
                );
            }
            results.push(self.run_single_scenario(scenario, seed, iterations));
        }

        results
    }

    fn run_single_scenario(
        &self,
        scenario: &Scenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            match self.run_plan(scenario, iteration_seed) {
                Ok(outcome) => {
                    if let Some(err) = evaluate_expectations(scenario, &outcome) {
                        failures.push(format!(
                            "Iteration {} ({}): {err}",
                            i + 1,
                            outcome.describe()
                        ));
                        if self.verbose {
                            println!(
                                "  ❌ Iteration {}/{iterations} failed: {}",
                                i + 1,
                                err.red()
                            );
                        }
                    } else {
                        successes += 1;
                        let duration = start_time.elapsed();
                        performance_data.push(duration);
                        if self.verbose {
                            println!(
                                "  ✅ Iteration {}/{iterations} passed ({duration:?}) {}",
                                i + 1,
                                outcome.describe()
                            );
                        }
                    }
                }
                Err(err) => {
                    log::error!(
                        "scenario {} seed {iteration_seed} errored: {err:#}",
                        scenario.key
                    );
                    failures.push(format!(
                        "Iteration {} (seed {iteration_seed}): run error: {err:#}",
                        i + 1
                    ));
                }
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name.to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        }
    }

    fn run_plan(&self, scenario: &Scenario, seed: u64) -> anyhow::Result<RunOutcome> {
        match &scenario.plan {
            ScenarioPlan::Session(plan) => {
                run_session(&self.assets, plan, seed).map(RunOutcome::Session)
            }
            ScenarioPlan::Calendar(plan) => {
                run_calendar(&self.assets, plan, seed).map(RunOutcome::Calendar)
            }
        }
    }
}

fn evaluate_expectations(scenario: &Scenario, outcome: &RunOutcome) -> Option<String> {
    scenario
        .expectations
        .iter()
        .find_map(|expectation| expectation.evaluate(outcome).err())
        .map(|err| err.to_string())
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
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
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
        let millis = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::scenarios::{RunOptions, get_scenario};

    #[test]
    fn miss_termination_passes_across_iterations() {
        let tester = LogicTester::new(TesterAssets::embedded(), false);
        let scenario = get_scenario("miss-termination", RunOptions { days: 7 }).unwrap();
        let results = tester.run_scenario(&scenario, &[5, 900], 3);
        assert_eq!(results.len(), 2);
        for result in results {
            assert!(result.passed, "{:?}", result.failures);
            assert_eq!(result.successful_iterations, 3);
            assert_eq!(result.performance_data.len(), 3);
        }
    }

    #[test]
    fn result_json_uses_millis() {
        let result = ScenarioResult {
            scenario_name: "Smoke".to_string(),
            seed: 1,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            average_duration: Duration::from_millis(12),
            performance_data: vec![Duration::from_millis(12)],
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["average_duration"], 12);
        let back: ScenarioResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.performance_data, vec![Duration::from_millis(12)]);
    }
}
