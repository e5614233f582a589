use log::{debug, info, warn};

use preference_sim::*;
use snafu::{prelude::*, Snafu};

use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::sim::config_reader::*;

#[derive(Debug, Snafu)]
pub enum AppError {
    #[snafu(display("Error opening scenario file {path}"))]
    OpeningScenario {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error opening summary file {path}"))]
    OpeningSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing summary file {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Simulation failed: {source}"))]
    Simulation { source: SimErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

type AppResult<T> = Result<T, AppError>;

fn result_stats_to_json(rs: &SimResult) -> Vec<JSValue> {
    let mut l: Vec<JSValue> = Vec::new();
    for round_stat in rs.round_stats.iter() {
        let mut tally: JSMap<String, JSValue> = JSMap::new();
        for (party, count) in round_stat.tally.iter() {
            tally.insert(party.to_string(), json!(count.to_string()));
        }

        let mut tally_results: Vec<JSValue> = Vec::new();
        if let Some(elim_stats) = &round_stat.eliminated {
            let mut transfers: JSMap<String, JSValue> = JSMap::new();
            for (party, count) in elim_stats.transfers.iter() {
                // Candidates without any transferred vote are not listed.
                if *count > 0 {
                    transfers.insert(party.to_string(), json!(count.to_string()));
                }
            }
            if elim_stats.exhausted > 0 {
                transfers.insert(
                    "exhausted".to_string(),
                    json!(elim_stats.exhausted.to_string()),
                );
            }
            tally_results.push(json!({
                "eliminated": elim_stats.eliminated.to_string(),
                "transfers": transfers
            }));
        }

        let js = json!({"round": round_stat.round, "tally": tally, "tallyResults": tally_results});
        l.push(js);
    }
    l
}

pub mod config_reader {
    use crate::sim::*;

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct OutputSettings {
        #[serde(rename = "contestName")]
        pub contest_name: String,
        #[serde(rename = "contestDate")]
        pub contest_date: Option<String>,
        pub jurisdiction: Option<String>,
    }

    /// The header of the summary, echoing the scenario back to the reader.
    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct OutputConfig {
        pub contest: String,
        pub date: Option<String>,
        pub jurisdiction: Option<String>,
        #[serde(rename = "totalVotes")]
        pub total_votes: String,
    }

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct PrimariesConfig {
        pub alp: f64,
        pub lib: f64,
        pub grn: f64,
    }

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct FlowsConfig {
        #[serde(rename = "alpToGrn")]
        pub alp_to_grn: f64,
        #[serde(rename = "libToGrn")]
        pub lib_to_grn: f64,
        #[serde(rename = "grnToAlp")]
        pub grn_to_alp: f64,
        #[serde(rename = "othToAlp")]
        pub oth_to_alp: f64,
        #[serde(rename = "othToGrn")]
        pub oth_to_grn: f64,
        #[serde(rename = "othToLib")]
        pub oth_to_lib: f64,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct RulesConfig {
        #[serde(rename = "totalVotes")]
        pub total_votes: Option<u64>,
        #[serde(rename = "tiebreakMode")]
        pub tiebreak_mode: Option<String>,
        #[serde(rename = "randomSeed")]
        pub random_seed: Option<String>,
    }

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct ScenarioConfig {
        #[serde(rename = "outputSettings")]
        pub output_settings: Option<OutputSettings>,
        pub primaries: PrimariesConfig,
        #[serde(rename = "preferenceFlows")]
        pub preference_flows: Option<FlowsConfig>,
        pub rules: Option<RulesConfig>,
    }

    impl ScenarioConfig {
        /// The scenario with the defaults filled in. Omitted flows fall back
        /// to the 2022 calibration.
        pub fn scenario(&self) -> Scenario {
            let flows = match &self.preference_flows {
                Some(f) => PreferenceFlows {
                    alp_to_grn: f.alp_to_grn,
                    lib_to_grn: f.lib_to_grn,
                    grn_to_alp: f.grn_to_alp,
                    oth_to_alp: f.oth_to_alp,
                    oth_to_grn: f.oth_to_grn,
                    oth_to_lib: f.oth_to_lib,
                },
                None => PreferenceFlows::CALIBRATION_2022,
            };
            Scenario {
                primaries: Primaries {
                    alp: self.primaries.alp,
                    lib: self.primaries.lib,
                    grn: self.primaries.grn,
                },
                flows,
            }
        }

        pub fn contest_name(&self) -> String {
            self.output_settings
                .as_ref()
                .map(|o| o.contest_name.clone())
                .unwrap_or_else(|| "Preferential contest".to_string())
        }

        pub fn contest_date(&self) -> Option<String> {
            self.output_settings
                .as_ref()
                .and_then(|o| o.contest_date.clone())
        }

        pub fn jurisdiction(&self) -> Option<String> {
            self.output_settings
                .as_ref()
                .and_then(|o| o.jurisdiction.clone())
        }
    }

    pub fn read_summary(path: String) -> AppResult<JSValue> {
        let contents = fs::read_to_string(path.clone())
            .context(OpeningSummarySnafu { path: path.clone() })?;
        debug!("read content: {:?}", contents);
        let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(js)
    }
}

fn validate_rules(rules: &Option<RulesConfig>) -> AppResult<SimOptions> {
    let defaults = SimOptions::DEFAULT_OPTIONS;
    let rules = match rules {
        Some(r) => r,
        None => return Ok(defaults),
    };
    let tiebreak_mode = match rules.tiebreak_mode.as_deref() {
        None | Some("useCandidateOrder") => TieBreakMode::UseCandidateOrder,
        Some("random") => {
            let seed = match rules.random_seed.clone().map(|s| s.parse::<u32>()) {
                Some(Result::Ok(x)) => x,
                x => {
                    whatever!(
                        "Cannot use the random tiebreak mode without a valid randomSeed: {:?}",
                        x
                    )
                }
            };
            TieBreakMode::Random(seed)
        }
        Some(x) => {
            whatever!(
                "Cannot use tiebreak mode {:?} (currently not implemented)",
                x
            )
        }
    };
    Ok(SimOptions {
        total_votes: rules.total_votes.unwrap_or(defaults.total_votes),
        tiebreak_mode,
    })
}

fn build_summary_js(config: &ScenarioConfig, options: &SimOptions, rv: &SimResult) -> JSValue {
    let c = OutputConfig {
        contest: config.contest_name(),
        date: config.contest_date(),
        jurisdiction: config.jurisdiction(),
        total_votes: options.total_votes.to_string(),
    };
    let mut final_two: JSMap<String, JSValue> = JSMap::new();
    for (party, share) in rv.final_two.iter() {
        final_two.insert(party.to_string(), json!(format!("{:.4}", share)));
    }
    json!({
        "config": c,
        "finalTwo": final_two,
         "results": result_stats_to_json(rv) })
}

pub fn run_from_config(
    scenario_path: String,
    check_summary_path: Option<String>,
    out_path: Option<String>,
    total_votes: Option<u64>,
) -> AppResult<()> {
    let config_str = fs::read_to_string(scenario_path.clone()).context(OpeningScenarioSnafu {
        path: scenario_path.clone(),
    })?;
    let config: ScenarioConfig = serde_json::from_str(&config_str).context(ParsingJsonSnafu {})?;
    info!("config: {:?}", config);

    // Validate the rules:
    let mut options = validate_rules(&config.rules)?;
    if let Some(tv) = total_votes {
        options.total_votes = tv;
    }

    let scenario = config.scenario();
    let result = run_simulation(&scenario, &options).context(SimulationSnafu {})?;
    info!("res {:?}", result);

    // Assemble the final json
    let result_js = build_summary_js(&config, &options, &result);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    match out_path.as_deref() {
        None | Some("stdout") => println!("{}", pretty_js_stats),
        Some(path) => {
            info!("Writing summary to {}", path);
            fs::write(path, pretty_js_stats.as_bytes()).context(WritingSummarySnafu {
                path: path.to_string(),
            })?;
        }
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(summary_p)?;
        debug!("summary: {:?}", summary_ref);
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}
