// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// The candidates of the simulated contest, in canonical order.
///
/// `Oth` is an aggregate bucket for minor parties and independents. The three
/// major parties always rank it last, and its own preferences are only known
/// through the configured flows.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Party {
    Alp,
    Lib,
    Grn,
    Oth,
}

impl Party {
    /// All candidates in canonical order. This order is used for padding
    /// rankings and as the default elimination precedence on ties.
    pub const ALL: [Party; 4] = [Party::Alp, Party::Lib, Party::Grn, Party::Oth];

    pub fn as_str(&self) -> &'static str {
        match self {
            Party::Alp => "ALP",
            Party::Lib => "LIB",
            Party::Grn => "GRN",
            Party::Oth => "OTH",
        }
    }
}

impl Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The primary vote of the three major parties, in percent of the formal
/// vote. The OTH share is always the remainder to 100.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Primaries {
    pub alp: f64,
    pub lib: f64,
    pub grn: f64,
}

impl Primaries {
    /// The derived OTH primary. Clamped at zero so that float noise in the
    /// caller's numbers does not produce a negative share.
    pub fn oth(&self) -> f64 {
        (100.0 - self.alp - self.lib - self.grn).max(0.0)
    }
}

/// The preference flows between the parties, each in percent of the sending
/// party's voters.
///
/// Only the six independent flows are stored. The complements for the major
/// parties are computed, never supplied: a major's voters split between the
/// two other majors, with OTH always last.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct PreferenceFlows {
    pub alp_to_grn: f64,
    pub lib_to_grn: f64,
    pub grn_to_alp: f64,
    pub oth_to_alp: f64,
    pub oth_to_grn: f64,
    pub oth_to_lib: f64,
}

impl PreferenceFlows {
    /// Flows observed at the 2022 federal and Victorian state elections
    /// (Prahran and Melbourne for the major-party flows, Macnamara for the
    /// Greens flow). Useful as a starting point for nearby contests.
    pub const CALIBRATION_2022: PreferenceFlows = PreferenceFlows {
        alp_to_grn: 83.0,
        lib_to_grn: 29.0,
        grn_to_alp: 88.0,
        oth_to_alp: 18.0,
        oth_to_grn: 33.0,
        oth_to_lib: 49.0,
    };

    pub fn alp_to_lib(&self) -> f64 {
        100.0 - self.alp_to_grn
    }

    pub fn lib_to_alp(&self) -> f64 {
        100.0 - self.lib_to_grn
    }

    pub fn grn_to_lib(&self) -> f64 {
        100.0 - self.grn_to_alp
    }

    /// Checks that every flow is a percentage. The complements are covered by
    /// checking the stored fields.
    pub fn validate(&self) -> Result<(), SimErrors> {
        let fields = [
            ("alp_to_grn", self.alp_to_grn),
            ("lib_to_grn", self.lib_to_grn),
            ("grn_to_alp", self.grn_to_alp),
            ("oth_to_alp", self.oth_to_alp),
            ("oth_to_grn", self.oth_to_grn),
            ("oth_to_lib", self.oth_to_lib),
        ];
        for (name, value) in fields {
            if !(0.0..=100.0).contains(&value) {
                return Err(SimErrors::FlowOutOfRange { name, value });
            }
        }
        Ok(())
    }
}

/// A full simulation input: primaries plus flows.
///
/// The fields are public and may be assembled directly; the
/// [builder](crate::builder::ScenarioBuilder) offers a checked alternative.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Scenario {
    pub primaries: Primaries,
    pub flows: PreferenceFlows,
}

impl Scenario {
    /// Validates the scenario and returns the contesting candidates with
    /// their primary share, in canonical order.
    ///
    /// A party with a zero primary is excluded from the contest entirely.
    /// Fewer than two contesting candidates is an input error.
    pub fn contesting(&self) -> Result<Vec<(Party, f64)>, SimErrors> {
        self.flows.validate()?;
        let major_shares = [
            (Party::Alp, self.primaries.alp),
            (Party::Lib, self.primaries.lib),
            (Party::Grn, self.primaries.grn),
        ];
        for (party, value) in major_shares {
            if !(0.0..=100.0).contains(&value) {
                return Err(SimErrors::PrimaryOutOfRange { party, value });
            }
        }
        let raw_oth = 100.0 - self.primaries.alp - self.primaries.lib - self.primaries.grn;
        if raw_oth <= -0.01 {
            return Err(SimErrors::InvalidPrimaries {
                total: self.primaries.alp + self.primaries.lib + self.primaries.grn,
            });
        }
        let mut shares: Vec<(Party, f64)> = major_shares.to_vec();
        shares.push((Party::Oth, self.primaries.oth()));
        shares.retain(|(_, pct)| *pct > 0.0);
        if shares.len() < 2 {
            return Err(SimErrors::NotEnoughCandidates);
        }
        Ok(shares)
    }
}

/// A synthetic ballot: a ranking over the contesting candidates and the
/// number of voters casting exactly that ranking.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Ballot {
    pub ranking: Vec<Party>,
    pub weight: u64,
}

// ******** Output data structures *********

/// The transfers recorded when a candidate is eliminated.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct EliminationStats {
    pub eliminated: Party,
    /// Weight transferred to each surviving candidate, in canonical order.
    pub transfers: Vec<(Party, u64)>,
    /// Weight with no surviving ranked candidate. Always zero for ballots
    /// produced by the synthesizer, which ranks every contesting candidate.
    pub exhausted: u64,
}

/// Statistics for one counting round.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RoundStats {
    pub round: u32,
    /// First-preference totals of the candidates still standing, in
    /// canonical order.
    pub tally: Vec<(Party, u64)>,
    /// The elimination performed this round. `None` only for the final
    /// round, which reports the two survivors without eliminating anyone.
    pub eliminated: Option<EliminationStats>,
}

/// The outcome of a simulation run.
#[derive(PartialEq, Debug, Clone)]
pub struct SimResult {
    /// Exactly two candidates with their share of the final-round vote, in
    /// percent summing to 100 (0.0 each in the degenerate zero-vote case).
    /// Ordered by descending weight, canonical order on equal weights.
    pub final_two: Vec<(Party, f64)>,
    /// Total formal weight in the final round.
    pub total_final_votes: u64,
    pub round_stats: Vec<RoundStats>,
}

/// Errors that prevent a simulation from completing.
#[derive(PartialEq, Debug, Clone)]
pub enum SimErrors {
    /// A major-party primary outside [0, 100].
    PrimaryOutOfRange { party: Party, value: f64 },
    /// Primaries that leave a negative OTH remainder.
    InvalidPrimaries { total: f64 },
    /// A preference flow outside [0, 100].
    FlowOutOfRange { name: &'static str, value: f64 },
    /// Fewer than two candidates with a nonzero primary vote.
    NotEnoughCandidates,
    /// The counter was handed a ballot ranking no contesting candidate.
    MalformedBallot { index: usize },
    /// The count finished with fewer than two candidates.
    CountingAnomaly,
    /// The elimination loop exceeded its round cap.
    NoConvergence,
}

impl Error for SimErrors {}

impl Display for SimErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErrors::PrimaryOutOfRange { party, value } => {
                write!(f, "primary vote for {} is out of range: {}", party, value)
            }
            SimErrors::InvalidPrimaries { total } => {
                write!(
                    f,
                    "major primary votes total {:.2}%, leaving a negative OTH share",
                    total
                )
            }
            SimErrors::FlowOutOfRange { name, value } => {
                write!(f, "preference flow {} is out of range: {}", name, value)
            }
            SimErrors::NotEnoughCandidates => {
                write!(f, "need at least two candidates with a nonzero primary vote")
            }
            SimErrors::MalformedBallot { index } => {
                write!(f, "ballot {} does not rank any contesting candidate", index)
            }
            SimErrors::CountingAnomaly => {
                write!(f, "the count finished with fewer than two candidates")
            }
            SimErrors::NoConvergence => {
                write!(f, "the elimination count did not converge")
            }
        }
    }
}

// ********* Configuration **********

/// How to resolve a tie for the lowest tally in an elimination round.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TieBreakMode {
    /// Eliminate the tied candidate occurring latest in the contesting
    /// order. Deterministic and easy to audit.
    UseCandidateOrder,
    /// Order the tied candidates by a cryptographic hash of the seed, the
    /// round number and the candidate name, then eliminate the first.
    /// Reproducible for a fixed seed, hard to predict otherwise.
    Random(u32),
}

/// The tuning knobs of a simulation run.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct SimOptions {
    /// Size of the synthetic electorate. Larger values reduce the impact of
    /// integer rounding on tight margins.
    pub total_votes: u64,
    pub tiebreak_mode: TieBreakMode,
}

impl SimOptions {
    pub const DEFAULT_OPTIONS: SimOptions = SimOptions {
        total_votes: 100_000,
        tiebreak_mode: TieBreakMode::UseCandidateOrder,
    };
}

impl Default for SimOptions {
    fn default() -> SimOptions {
        SimOptions::DEFAULT_OPTIONS
    }
}
