mod config;
mod synth;

pub mod builder;
pub mod manual;

use log::{debug, info, warn};

use std::{
    collections::{HashMap, HashSet},
    ops::{Add, AddAssign},
};

pub use crate::config::*;
pub use crate::synth::synthesize_ballots;

// **** Private structures ****

type RoundId = u32;

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct VoteWeight(u64);

impl VoteWeight {
    const EMPTY: VoteWeight = VoteWeight(0);
}

impl std::iter::Sum for VoteWeight {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        VoteWeight(iter.map(|vw| vw.0).sum())
    }
}

impl AddAssign for VoteWeight {
    fn add_assign(&mut self, rhs: VoteWeight) {
        self.0 += rhs.0;
    }
}

impl Add for VoteWeight {
    type Output = VoteWeight;
    fn add(self: VoteWeight, rhs: VoteWeight) -> VoteWeight {
        VoteWeight(self.0 + rhs.0)
    }
}

// Invariant: `first` is always a live candidate.
#[derive(Eq, PartialEq, Debug, Clone)]
struct RankedBallot {
    first: Party,
    rest: Vec<Party>,
    weight: VoteWeight,
}

impl RankedBallot {
    /// Advances the ballot past the candidates who are no longer standing.
    /// Returns `None` when no ranked candidate survives.
    fn advance(&self, live: &HashSet<Party>) -> Option<RankedBallot> {
        // If the top candidate is still standing, keep the ballot as it is.
        if live.contains(&self.first) {
            return Some(self.clone());
        }
        let mut rest: Vec<Party> = self
            .rest
            .iter()
            .copied()
            .filter(|p| live.contains(p))
            .collect();
        if rest.is_empty() {
            return None;
        }
        let first = rest.remove(0);
        Some(RankedBallot {
            first,
            rest,
            weight: self.weight,
        })
    }
}

// **** Public interface ****

/// Synthesizes an electorate from the scenario and counts it down to the
/// final pair of candidates.
///
/// This is the main entry point: it validates the scenario, expands every
/// party's primary vote into ranked ballots and then runs the elimination
/// count with [count_final_two].
pub fn run_simulation(scenario: &Scenario, options: &SimOptions) -> Result<SimResult, SimErrors> {
    let contesting = scenario.contesting()?;
    let candidates: Vec<Party> = contesting.iter().map(|(p, _)| *p).collect();
    info!(
        "Contest between {:?} over an electorate of {} votes",
        candidates, options.total_votes
    );
    let mut ballots: Vec<Ballot> = Vec::new();
    for (party, pct) in contesting.iter() {
        ballots.extend(synthesize_ballots(
            *party,
            *pct,
            options.total_votes,
            &scenario.flows,
            &candidates,
        ));
    }
    // Rounding each party separately can leave the electorate a few votes
    // off the requested size. Fold the difference into the first pattern.
    let synthesized: u64 = ballots.iter().map(|b| b.weight).sum();
    if synthesized != options.total_votes {
        let drift = (options.total_votes as i64) - (synthesized as i64);
        match ballots.first_mut() {
            Some(ballot) if (ballot.weight as i64) + drift >= 0 => {
                warn!(
                    "Synthesized {} votes for an electorate of {}, adjusting the first ballot pattern by {}",
                    synthesized, options.total_votes, drift
                );
                ballot.weight = ((ballot.weight as i64) + drift) as u64;
            }
            _ => {
                warn!(
                    "Synthesized {} votes for an electorate of {}, unable to adjust",
                    synthesized, options.total_votes
                );
            }
        }
    }
    count_final_two(&ballots, &candidates, options)
}

/// Runs the elimination count on already synthesized ballots.
///
/// Every round the candidate with the fewest first preferences leaves and
/// their ballots move to the next surviving preference, until exactly two
/// candidates remain. The returned [SimResult] carries per-round tallies and
/// transfers along with the final two-candidate split.
pub fn count_final_two(
    ballots: &[Ballot],
    contesting: &[Party],
    options: &SimOptions,
) -> Result<SimResult, SimErrors> {
    if contesting.len() < 2 {
        return Err(SimErrors::NotEnoughCandidates);
    }
    let mut cur_ballots = prepare_ballots(ballots, contesting)?;
    info!(
        "Counting {} ballot patterns between {:?}",
        cur_ballots.len(),
        contesting
    );
    let mut live: HashSet<Party> = contesting.iter().copied().collect();
    let mut round_stats: Vec<RoundStats> = Vec::new();
    let mut round_id: RoundId = 1;
    while live.len() > 2 {
        // One candidate leaves per round, so a field of four is done in two
        // eliminations. Anything beyond the field size is an internal error.
        if round_id > contesting.len() as u32 {
            return Err(SimErrors::NoConvergence);
        }
        let tally = compute_tally(&cur_ballots, &live);
        debug!("Round {}: tally: {:?}", round_id, tally);
        let loser = find_lowest_candidate(&tally, options.tiebreak_mode, contesting, round_id)?;
        let loser_count = tally.get(&loser).copied().unwrap_or(VoteWeight::EMPTY);
        live.remove(&loser);
        let (next_ballots, elimination) = transfer_ballots(&cur_ballots, loser, &live);
        info!(
            "Round {}: eliminated {} with {} first preferences",
            round_id, loser, loser_count.0
        );
        round_stats.push(RoundStats {
            round: round_id,
            tally: sorted_tally(&tally),
            eliminated: Some(elimination),
        });
        cur_ballots = next_ballots;
        round_id += 1;
    }
    let tally = compute_tally(&cur_ballots, &live);
    let mut finalists: Vec<(Party, VoteWeight)> = Party::ALL
        .iter()
        .filter_map(|p| tally.get(p).map(|w| (*p, *w)))
        .collect();
    finalists.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    if finalists.len() < 2 {
        return Err(SimErrors::CountingAnomaly);
    }
    // More than two survivors cannot happen with one elimination per round,
    // but the reported pair is the top two either way.
    finalists.truncate(2);
    let total: VoteWeight = finalists.iter().map(|(_, w)| *w).sum();
    let final_two: Vec<(Party, f64)> = finalists
        .iter()
        .map(|(p, w)| {
            let share = if total == VoteWeight::EMPTY {
                0.0
            } else {
                100.0 * (w.0 as f64) / (total.0 as f64)
            };
            (*p, share)
        })
        .collect();
    round_stats.push(RoundStats {
        round: round_id,
        tally: sorted_tally(&tally),
        eliminated: None,
    });
    info!(
        "Final pair: {} {:.4}% against {} {:.4}%",
        final_two[0].0, final_two[0].1, final_two[1].0, final_two[1].1
    );
    Ok(SimResult {
        final_two,
        total_final_votes: total.0,
        round_stats,
    })
}

// **** Counting internals ****

/// Reduces the raw ballots for counting. Weightless ballots are dropped, a
/// ballot ranking no contesting candidate is an input error.
fn prepare_ballots(
    ballots: &[Ballot],
    contesting: &[Party],
) -> Result<Vec<RankedBallot>, SimErrors> {
    let live: HashSet<Party> = contesting.iter().copied().collect();
    let mut prepared: Vec<RankedBallot> = Vec::with_capacity(ballots.len());
    for (index, ballot) in ballots.iter().enumerate() {
        if ballot.weight == 0 {
            continue;
        }
        let mut ranked: Vec<Party> = ballot
            .ranking
            .iter()
            .copied()
            .filter(|p| live.contains(p))
            .collect();
        if ranked.is_empty() {
            warn!(
                "Ballot {} with ranking {:?} lists no contesting candidate",
                index, ballot.ranking
            );
            return Err(SimErrors::MalformedBallot { index });
        }
        let first = ranked.remove(0);
        prepared.push(RankedBallot {
            first,
            rest: ranked,
            weight: VoteWeight(ballot.weight),
        });
    }
    Ok(prepared)
}

// Initialized with every live candidate so that a candidate without a single
// first preference still shows up in the round statistics.
fn compute_tally(ballots: &[RankedBallot], live: &HashSet<Party>) -> HashMap<Party, VoteWeight> {
    let mut tally: HashMap<Party, VoteWeight> = live
        .iter()
        .map(|p| (*p, VoteWeight::EMPTY))
        .collect();
    for ballot in ballots.iter() {
        if let Some(w) = tally.get_mut(&ballot.first) {
            *w += ballot.weight;
        }
    }
    tally
}

/// The tally as a vector in canonical candidate order.
fn sorted_tally(tally: &HashMap<Party, VoteWeight>) -> Vec<(Party, u64)> {
    Party::ALL
        .iter()
        .filter_map(|p| tally.get(p).map(|w| (*p, w.0)))
        .collect()
}

/// Moves the ballots of the eliminated candidate to their next surviving
/// preference. `live` no longer contains the eliminated candidate.
fn transfer_ballots(
    ballots: &[RankedBallot],
    eliminated: Party,
    live: &HashSet<Party>,
) -> (Vec<RankedBallot>, EliminationStats) {
    let mut transfers: HashMap<Party, VoteWeight> = HashMap::new();
    let mut exhausted = VoteWeight::EMPTY;
    let remaining: Vec<RankedBallot> = ballots
        .iter()
        .filter_map(|ballot| {
            let advanced = ballot.advance(live);
            if ballot.first == eliminated {
                match &advanced {
                    Some(b) => {
                        let e = transfers.entry(b.first).or_insert(VoteWeight::EMPTY);
                        *e += ballot.weight;
                    }
                    None => {
                        exhausted += ballot.weight;
                    }
                }
            }
            advanced
        })
        .collect();
    let stats = EliminationStats {
        eliminated,
        transfers: Party::ALL
            .iter()
            .copied()
            .filter(|p| live.contains(p))
            .map(|p| {
                let w = transfers.get(&p).copied().unwrap_or(VoteWeight::EMPTY);
                (p, w.0)
            })
            .collect(),
        exhausted: exhausted.0,
    };
    (remaining, stats)
}

/// Picks the candidate to eliminate: the lowest tally, with ties resolved by
/// the configured mode.
fn find_lowest_candidate(
    tally: &HashMap<Party, VoteWeight>,
    tiebreak: TieBreakMode,
    candidate_order: &[Party],
    round_id: RoundId,
) -> Result<Party, SimErrors> {
    let min_count: VoteWeight = tally
        .values()
        .min()
        .copied()
        .ok_or(SimErrors::CountingAnomaly)?;
    let all_smallest: Vec<Party> = candidate_order
        .iter()
        .copied()
        .filter(|p| tally.get(p) == Some(&min_count))
        .collect();
    match all_smallest.as_slice() {
        [] => Err(SimErrors::CountingAnomaly),
        [single] => Ok(*single),
        _ => {
            debug!(
                "Round {}: tie for elimination between {:?}",
                round_id, all_smallest
            );
            let queue: Vec<Party> = match tiebreak {
                // Loser selection works through the candidate order from
                // the back.
                TieBreakMode::UseCandidateOrder => {
                    let mut q = all_smallest;
                    q.reverse();
                    q
                }
                TieBreakMode::Random(seed) => {
                    candidate_permutation_crypto(&all_smallest, seed, round_id)
                }
            };
            debug!(
                "Round {}: elimination queue after tiebreak: {:?}",
                round_id, queue
            );
            queue.first().copied().ok_or(SimErrors::CountingAnomaly)
        }
    }
}

/// Generates a "random" permutation of the candidates. Random in this context
/// means hard to guess in advance: the order is stable for a given seed and
/// round but any change to either reshuffles it.
fn candidate_permutation_crypto(candidates: &[Party], seed: u32, round_id: RoundId) -> Vec<Party> {
    let mut data: Vec<(String, Party)> = candidates
        .iter()
        .map(|p| {
            let digest = sha256::digest(format!("{:08}{:08}{}", seed, round_id, p.as_str()));
            (digest, *p)
        })
        .collect();
    data.sort();
    data.iter().map(|p| p.1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Party::*;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn default_scenario() -> Scenario {
        Scenario {
            primaries: Primaries {
                alp: 31.8,
                lib: 29.0,
                grn: 29.7,
            },
            flows: PreferenceFlows::CALIBRATION_2022,
        }
    }

    #[test]
    fn test_default_scenario() {
        init_logs();
        let res = run_simulation(&default_scenario(), &SimOptions::DEFAULT_OPTIONS)
            .expect("simulation failed");
        assert_eq!(res.round_stats.len(), 3);

        let r1 = &res.round_stats[0];
        assert_eq!(
            r1.tally,
            vec![(Alp, 31800), (Lib, 29000), (Grn, 29700), (Oth, 9500)]
        );
        assert_eq!(
            r1.eliminated,
            Some(EliminationStats {
                eliminated: Oth,
                transfers: vec![(Alp, 1710), (Lib, 4655), (Grn, 3135)],
                exhausted: 0,
            })
        );

        let r2 = &res.round_stats[1];
        assert_eq!(r2.tally, vec![(Alp, 33510), (Lib, 33655), (Grn, 32835)]);
        assert_eq!(
            r2.eliminated,
            Some(EliminationStats {
                eliminated: Grn,
                transfers: vec![(Alp, 29271), (Lib, 3564)],
                exhausted: 0,
            })
        );

        let r3 = &res.round_stats[2];
        assert_eq!(r3.tally, vec![(Alp, 62781), (Lib, 37219)]);
        assert_eq!(r3.eliminated, None);

        assert_eq!(res.final_two, vec![(Alp, 62.781), (Lib, 37.219)]);
        assert_eq!(res.total_final_votes, 100_000);
    }

    #[test]
    fn test_three_way_contest() {
        init_logs();
        let scenario = Scenario {
            primaries: Primaries {
                alp: 31.0,
                lib: 32.0,
                grn: 28.0,
            },
            flows: PreferenceFlows {
                alp_to_grn: 60.0,
                lib_to_grn: 30.0,
                grn_to_alp: 70.0,
                oth_to_alp: 20.0,
                oth_to_grn: 60.0,
                oth_to_lib: 20.0,
            },
        };
        let res = run_simulation(&scenario, &SimOptions::DEFAULT_OPTIONS)
            .expect("simulation failed");

        let r2 = &res.round_stats[1];
        assert_eq!(r2.tally, vec![(Alp, 32800), (Lib, 33800), (Grn, 33400)]);
        assert_eq!(
            r2.eliminated,
            Some(EliminationStats {
                eliminated: Alp,
                transfers: vec![(Lib, 12400), (Grn, 20400)],
                exhausted: 0,
            })
        );

        assert_eq!(res.final_two, vec![(Grn, 53.8), (Lib, 46.2)]);
        assert_eq!(res.total_final_votes, 100_000);
    }

    #[test]
    fn test_high_green_scenario() {
        init_logs();
        let scenario = Scenario {
            primaries: Primaries {
                alp: 25.0,
                lib: 30.0,
                grn: 35.0,
            },
            flows: PreferenceFlows {
                alp_to_grn: 75.0,
                lib_to_grn: 20.0,
                grn_to_alp: 85.0,
                oth_to_alp: 40.0,
                oth_to_grn: 30.0,
                oth_to_lib: 30.0,
            },
        };
        let res = run_simulation(&scenario, &SimOptions::DEFAULT_OPTIONS)
            .expect("simulation failed");
        assert_eq!(res.final_two, vec![(Grn, 60.75), (Lib, 39.25)]);
    }

    #[test]
    fn test_higher_primary_lifts_final_share() {
        let base = run_simulation(&default_scenario(), &SimOptions::DEFAULT_OPTIONS)
            .expect("simulation failed");
        let raised = run_simulation(
            &Scenario {
                primaries: Primaries {
                    alp: 32.3,
                    lib: 28.5,
                    grn: 29.7,
                },
                flows: PreferenceFlows::CALIBRATION_2022,
            },
            &SimOptions::DEFAULT_OPTIONS,
        )
        .expect("simulation failed");
        assert_eq!(base.final_two[0], (Alp, 62.781));
        assert_eq!(raised.final_two[0], (Alp, 63.281));
        assert!(raised.final_two[0].1 > base.final_two[0].1);
    }

    #[test]
    fn test_two_candidate_contest() {
        let scenario = Scenario {
            primaries: Primaries {
                alp: 60.0,
                lib: 40.0,
                grn: 0.0,
            },
            flows: PreferenceFlows::CALIBRATION_2022,
        };
        let res = run_simulation(&scenario, &SimOptions::DEFAULT_OPTIONS)
            .expect("simulation failed");
        // Nobody is eliminated: the field already is the final pair.
        assert_eq!(res.round_stats.len(), 1);
        assert_eq!(res.round_stats[0].tally, vec![(Alp, 60000), (Lib, 40000)]);
        assert_eq!(res.round_stats[0].eliminated, None);
        assert_eq!(res.final_two, vec![(Alp, 60.0), (Lib, 40.0)]);
    }

    #[test]
    fn test_tie_break_uses_candidate_order() {
        let scenario = Scenario {
            primaries: Primaries {
                alp: 40.0,
                lib: 10.0,
                grn: 10.0,
            },
            flows: PreferenceFlows::CALIBRATION_2022,
        };
        let res = run_simulation(&scenario, &SimOptions::DEFAULT_OPTIONS)
            .expect("simulation failed");
        let first = res.round_stats[0]
            .eliminated
            .as_ref()
            .expect("missing elimination");
        // LIB and GRN tie on 10000: the later candidate in the order leaves.
        assert_eq!(first.eliminated, Grn);
    }

    #[test]
    fn test_tie_break_random_is_deterministic() {
        let scenario = Scenario {
            primaries: Primaries {
                alp: 40.0,
                lib: 10.0,
                grn: 10.0,
            },
            flows: PreferenceFlows::CALIBRATION_2022,
        };
        let options = SimOptions {
            total_votes: 100_000,
            tiebreak_mode: TieBreakMode::Random(42),
        };
        let res1 = run_simulation(&scenario, &options).expect("simulation failed");
        let res2 = run_simulation(&scenario, &options).expect("simulation failed");
        assert_eq!(res1, res2);
        let first = res1.round_stats[0]
            .eliminated
            .as_ref()
            .expect("missing elimination");
        assert!(first.eliminated == Lib || first.eliminated == Grn);
    }

    #[test]
    fn test_zero_electorate() {
        let options = SimOptions {
            total_votes: 0,
            tiebreak_mode: TieBreakMode::UseCandidateOrder,
        };
        let res = run_simulation(&default_scenario(), &options).expect("simulation failed");
        assert_eq!(res.final_two, vec![(Alp, 0.0), (Lib, 0.0)]);
        assert_eq!(res.total_final_votes, 0);
        assert_eq!(res.round_stats.len(), 3);
    }

    #[test]
    fn test_small_electorate_keeps_exact_total() {
        init_logs();
        let scenario = Scenario {
            primaries: Primaries {
                alp: 33.0,
                lib: 33.0,
                grn: 33.0,
            },
            flows: PreferenceFlows::CALIBRATION_2022,
        };
        let options = SimOptions {
            total_votes: 10,
            tiebreak_mode: TieBreakMode::UseCandidateOrder,
        };
        let res = run_simulation(&scenario, &options).expect("simulation failed");
        // Party targets round to 3 + 3 + 3 + 0 = 9: the missing vote lands
        // on the first ballot pattern.
        let r1 = &res.round_stats[0];
        assert_eq!(r1.tally, vec![(Alp, 4), (Lib, 3), (Grn, 3), (Oth, 0)]);
        assert_eq!(r1.tally.iter().map(|(_, w)| *w).sum::<u64>(), 10);
        assert_eq!(res.final_two, vec![(Alp, 70.0), (Lib, 30.0)]);
        assert_eq!(res.total_final_votes, 10);
    }

    #[test]
    fn test_contesting_includes_oth_remainder() {
        let scenario = Scenario {
            primaries: Primaries {
                alp: 25.0,
                lib: 30.0,
                grn: 35.0,
            },
            flows: PreferenceFlows::CALIBRATION_2022,
        };
        let contesting = scenario.contesting().expect("validation failed");
        assert_eq!(
            contesting,
            vec![(Alp, 25.0), (Lib, 30.0), (Grn, 35.0), (Oth, 10.0)]
        );
        assert_eq!(scenario.primaries.oth(), 10.0);
    }

    #[test]
    fn test_not_enough_candidates() {
        let scenario = Scenario {
            primaries: Primaries {
                alp: 0.0,
                lib: 0.0,
                grn: 100.0,
            },
            flows: PreferenceFlows::CALIBRATION_2022,
        };
        let res = run_simulation(&scenario, &SimOptions::DEFAULT_OPTIONS);
        assert_eq!(res, Err(SimErrors::NotEnoughCandidates));
    }

    #[test]
    fn test_invalid_primaries_total() {
        let scenario = Scenario {
            primaries: Primaries {
                alp: 50.0,
                lib: 40.0,
                grn: 20.0,
            },
            flows: PreferenceFlows::CALIBRATION_2022,
        };
        let res = run_simulation(&scenario, &SimOptions::DEFAULT_OPTIONS);
        assert_eq!(res, Err(SimErrors::InvalidPrimaries { total: 110.0 }));
    }

    #[test]
    fn test_primary_out_of_range() {
        let scenario = Scenario {
            primaries: Primaries {
                alp: 120.0,
                lib: 0.0,
                grn: 0.0,
            },
            flows: PreferenceFlows::CALIBRATION_2022,
        };
        let res = run_simulation(&scenario, &SimOptions::DEFAULT_OPTIONS);
        assert_eq!(
            res,
            Err(SimErrors::PrimaryOutOfRange {
                party: Alp,
                value: 120.0
            })
        );
    }

    #[test]
    fn test_flow_out_of_range() {
        let scenario = Scenario {
            primaries: Primaries {
                alp: 31.8,
                lib: 29.0,
                grn: 29.7,
            },
            flows: PreferenceFlows {
                alp_to_grn: 150.0,
                ..PreferenceFlows::CALIBRATION_2022
            },
        };
        let res = run_simulation(&scenario, &SimOptions::DEFAULT_OPTIONS);
        assert_eq!(
            res,
            Err(SimErrors::FlowOutOfRange {
                name: "alp_to_grn",
                value: 150.0
            })
        );
    }

    #[test]
    fn test_malformed_ballot() {
        let ballots = vec![Ballot {
            ranking: vec![Oth],
            weight: 5,
        }];
        let res = count_final_two(&ballots, &[Alp, Lib, Grn], &SimOptions::DEFAULT_OPTIONS);
        assert_eq!(res, Err(SimErrors::MalformedBallot { index: 0 }));
    }

    #[test]
    fn test_weightless_ballots_are_ignored() {
        let ballots = vec![
            Ballot {
                ranking: vec![Alp, Lib],
                weight: 10,
            },
            Ballot {
                ranking: vec![Lib, Alp],
                weight: 0,
            },
            Ballot {
                ranking: vec![Lib],
                weight: 5,
            },
        ];
        let res = count_final_two(&ballots, &[Alp, Lib], &SimOptions::DEFAULT_OPTIONS)
            .expect("count failed");
        assert_eq!(res.round_stats[0].tally, vec![(Alp, 10), (Lib, 5)]);
        assert_eq!(res.total_final_votes, 15);
    }

    #[test]
    fn test_exhausted_ballots() {
        let ballots = vec![
            Ballot {
                ranking: vec![Alp],
                weight: 10,
            },
            Ballot {
                ranking: vec![Lib, Alp],
                weight: 8,
            },
            Ballot {
                ranking: vec![Grn],
                weight: 6,
            },
        ];
        let res = count_final_two(&ballots, &[Alp, Lib, Grn], &SimOptions::DEFAULT_OPTIONS)
            .expect("count failed");
        assert_eq!(
            res.round_stats[0].eliminated,
            Some(EliminationStats {
                eliminated: Grn,
                transfers: vec![(Alp, 0), (Lib, 0)],
                exhausted: 6,
            })
        );
        assert_eq!(res.total_final_votes, 18);
        let alp_share = res.final_two[0].1;
        let lib_share = res.final_two[1].1;
        assert!((alp_share - 100.0 * 10.0 / 18.0).abs() < 1e-9);
        assert!((lib_share - 100.0 * 8.0 / 18.0).abs() < 1e-9);
        assert!((alp_share + lib_share - 100.0).abs() < 1e-9);
    }
}
