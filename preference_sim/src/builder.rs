pub use crate::config::*;

/// A checked builder for [Scenario].
///
/// The builder starts from the major-party primaries with the flows set to
/// [PreferenceFlows::CALIBRATION_2022] and lets callers override individual
/// flows before validating the whole scenario.
///
/// ```
/// use preference_sim::builder::ScenarioBuilder;
/// # use preference_sim::SimErrors;
///
/// let scenario = ScenarioBuilder::new(31.8, 29.0, 29.7)
///     .grn_to_alp(85.0)
///     .build()?;
///
/// assert_eq!(scenario.flows.grn_to_lib(), 15.0);
/// # Ok::<(), SimErrors>(())
/// ```
pub struct ScenarioBuilder {
    pub(crate) _primaries: Primaries,
    pub(crate) _flows: PreferenceFlows,
}

impl ScenarioBuilder {
    /// Starts a scenario from the three major-party primaries, in percent.
    /// The OTH share is the remainder to 100.
    pub fn new(alp: f64, lib: f64, grn: f64) -> ScenarioBuilder {
        ScenarioBuilder {
            _primaries: Primaries { alp, lib, grn },
            _flows: PreferenceFlows::CALIBRATION_2022,
        }
    }

    /// Replaces the three major-party primaries, in percent.
    pub fn primaries(self, alp: f64, lib: f64, grn: f64) -> ScenarioBuilder {
        ScenarioBuilder {
            _primaries: Primaries { alp, lib, grn },
            ..self
        }
    }

    /// Replaces all the flows at once.
    pub fn flows(self, flows: &PreferenceFlows) -> ScenarioBuilder {
        ScenarioBuilder {
            _primaries: self._primaries,
            _flows: *flows,
        }
    }

    pub fn alp_to_grn(self, pct: f64) -> ScenarioBuilder {
        ScenarioBuilder {
            _flows: PreferenceFlows {
                alp_to_grn: pct,
                ..self._flows
            },
            ..self
        }
    }

    pub fn lib_to_grn(self, pct: f64) -> ScenarioBuilder {
        ScenarioBuilder {
            _flows: PreferenceFlows {
                lib_to_grn: pct,
                ..self._flows
            },
            ..self
        }
    }

    pub fn grn_to_alp(self, pct: f64) -> ScenarioBuilder {
        ScenarioBuilder {
            _flows: PreferenceFlows {
                grn_to_alp: pct,
                ..self._flows
            },
            ..self
        }
    }

    /// Sets how the OTH primary splits between the majors, in percent of the
    /// OTH vote. The three values are expected to total roughly 100.
    pub fn oth_split(self, to_alp: f64, to_grn: f64, to_lib: f64) -> ScenarioBuilder {
        ScenarioBuilder {
            _flows: PreferenceFlows {
                oth_to_alp: to_alp,
                oth_to_grn: to_grn,
                oth_to_lib: to_lib,
                ..self._flows
            },
            ..self
        }
    }

    /// Validates the assembled scenario.
    pub fn build(&self) -> Result<Scenario, SimErrors> {
        let scenario = Scenario {
            primaries: self._primaries,
            flows: self._flows,
        };
        scenario.contesting()?;
        Ok(scenario)
    }
}
