//! Expansion of primary votes into complete ranked ballots.
//!
//! Voters are modelled as a small set of fixed ranking archetypes per party,
//! weighted by the configured preference flows. Archetype weights are rounded
//! to integers with a largest-remainder scheme so that each party's ballots
//! add up to its share of the electorate.

use log::{debug, warn};

use crate::config::{Ballot, Party, PreferenceFlows};

/// Builds the ballots cast by one party's voters.
///
/// `primary_pct` is the party's primary vote in percent and `contesting` the
/// candidates actually standing, in canonical order. Rankings are restricted
/// to contesting candidates and always rank all of them. Archetypes rounding
/// to zero voters are dropped.
pub fn synthesize_ballots(
    party: Party,
    primary_pct: f64,
    total_votes: u64,
    flows: &PreferenceFlows,
    contesting: &[Party],
) -> Vec<Ballot> {
    let share = primary_pct * (total_votes as f64) / 100.0;
    let target = share.round() as u64;
    let patterns = archetypes(party, flows);
    let raw: Vec<f64> = patterns
        .iter()
        .map(|(_, pct)| share * pct / 100.0)
        .collect();
    let weights = round_weights(&raw, target);
    let mut ballots: Vec<Ballot> = Vec::new();
    for ((ranking, _), weight) in patterns.into_iter().zip(weights) {
        if weight == 0 {
            continue;
        }
        let mut ranking: Vec<Party> = ranking
            .into_iter()
            .filter(|p| contesting.contains(p))
            .collect();
        for p in contesting {
            if !ranking.contains(p) {
                ranking.push(*p);
            }
        }
        ballots.push(Ballot { ranking, weight });
    }
    debug!(
        "Synthesized {} ballot patterns for {} ({} votes)",
        ballots.len(),
        party,
        target
    );
    ballots
}

/// The full-ballot rankings of a party's voters with their weight in percent
/// of the party's primary vote.
fn archetypes(party: Party, flows: &PreferenceFlows) -> Vec<(Vec<Party>, f64)> {
    use Party::*;
    match party {
        Alp => vec![
            (vec![Alp, Grn, Lib, Oth], flows.alp_to_grn),
            (vec![Alp, Lib, Grn, Oth], flows.alp_to_lib()),
        ],
        Lib => vec![
            (vec![Lib, Grn, Alp, Oth], flows.lib_to_grn),
            (vec![Lib, Alp, Grn, Oth], flows.lib_to_alp()),
        ],
        Grn => vec![
            (vec![Grn, Alp, Lib, Oth], flows.grn_to_alp),
            (vec![Grn, Lib, Alp, Oth], flows.grn_to_lib()),
        ],
        Oth => oth_archetypes(flows),
    }
}

/// OTH voters split three ways, one archetype per major party. After the
/// preferred major, the remaining majors follow that major's own flow: a
/// voter putting ALP second is assumed to order GRN and LIB the way ALP
/// voters do.
fn oth_archetypes(flows: &PreferenceFlows) -> Vec<(Vec<Party>, f64)> {
    use Party::*;
    let mut split = [flows.oth_to_alp, flows.oth_to_grn, flows.oth_to_lib];
    let total: f64 = split.iter().sum();
    if total <= 0.0 {
        warn!("OTH preference flows are all zero, splitting OTH voters evenly");
        split = [100.0 / 3.0; 3];
    } else if !(99.0..=101.0).contains(&total) {
        warn!("OTH preference flows total {:.2}%, rescaling to 100%", total);
        for f in split.iter_mut() {
            *f *= 100.0 / total;
        }
    }
    let to_alp = if flows.alp_to_grn >= 50.0 {
        vec![Oth, Alp, Grn, Lib]
    } else {
        vec![Oth, Alp, Lib, Grn]
    };
    let to_grn = if flows.grn_to_alp >= 50.0 {
        vec![Oth, Grn, Alp, Lib]
    } else {
        vec![Oth, Grn, Lib, Alp]
    };
    let to_lib = if flows.lib_to_grn >= 50.0 {
        vec![Oth, Lib, Grn, Alp]
    } else {
        vec![Oth, Lib, Alp, Grn]
    };
    vec![(to_alp, split[0]), (to_grn, split[1]), (to_lib, split[2])]
}

/// Largest-remainder rounding: floors first, then the missing votes go one
/// at a time to the entries with the largest fractional part, cycling when
/// there are more votes than entries. A float total above the target is
/// handled symmetrically by decrementing, smallest fractional part first,
/// never below zero. Ties keep the original entry order.
fn round_weights(raw: &[f64], total: u64) -> Vec<u64> {
    let mut rounded: Vec<u64> = raw.iter().map(|w| w.floor().max(0.0) as u64).collect();
    let allocated: u64 = rounded.iter().sum();
    let frac = |w: f64| w - w.floor();
    let mut order: Vec<usize> = (0..raw.len()).collect();
    if allocated < total {
        order.sort_by(|&a, &b| frac(raw[b]).total_cmp(&frac(raw[a])));
        let mut missing = total - allocated;
        let mut i = 0usize;
        while missing > 0 && !order.is_empty() {
            rounded[order[i % order.len()]] += 1;
            missing -= 1;
            i += 1;
        }
    } else if allocated > total {
        order.sort_by(|&a, &b| frac(raw[a]).total_cmp(&frac(raw[b])));
        let mut excess = allocated - total;
        let mut i = 0usize;
        while excess > 0 {
            let idx = order[i % order.len()];
            if rounded[idx] > 0 {
                rounded[idx] -= 1;
                excess -= 1;
            }
            i += 1;
        }
    }
    rounded
}
