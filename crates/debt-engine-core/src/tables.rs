//! Regulatory reference tables.
//!
//! Every threshold, band and multiplier used by staging, expected-loss and
//! abusiveness grading lives in one immutable [`RegulatoryTables`] value that
//! callers inject. `Default` carries the currently published values; revisions
//! are a data change (`RegulatoryTables::from_json`) rather than a code change.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::DebtEngineError;
use crate::types::Percent;
use crate::DebtEngineResult;

/// Risk parameters of one operation-profile band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileParameters {
    /// Elapsed arrears (months) from which the exposure is fully lost.
    pub write_off_horizon_months: Decimal,
    /// Multiplier applied to the stage base PD.
    pub pd_multiplier: Decimal,
    /// Base LGD before guarantee mitigation (0-100).
    pub base_lgd_pct: Percent,
}

/// Arrears thresholds separating the three stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageThresholds {
    /// Highest arrears count still classified as Stage 1.
    pub stage_1_max_days: i64,
    /// Highest arrears count still classified as Stage 2.
    pub stage_2_max_days: i64,
    /// Post-restructuring window during which Stage 2 is the floor.
    pub observation_window_days: i64,
}

/// Base PD per stage (0-100), before the profile multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagePd {
    pub stage_1_pct: Percent,
    pub stage_2_pct: Percent,
    pub stage_3_pct: Percent,
    /// Elapsed months at which the Stage 3 PD starts climbing towards 100%.
    pub stage_3_ramp_start_months: Decimal,
}

/// Guarantee mitigation and LGD bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LgdRules {
    /// Maximum fractional LGD reduction from guarantees.
    pub mitigation_cap: Decimal,
    /// Guarantee value that maps to a mitigation of 1.0 before capping.
    pub mitigation_divisor: Decimal,
    pub floor_pct: Percent,
    pub ceiling_pct: Percent,
}

/// Rate abusiveness grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbusivenessRules {
    /// Contract rate above `abusive_multiple × reference` is abusive.
    pub abusive_multiple: Decimal,
    /// Lower bounds (exclusive) of the five severity levels, as % deviation
    /// above the reference rate, ascending.
    pub severity_thresholds_pct: [Percent; 5],
}

/// The full set of externally imposed constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryTables {
    pub stages: StageThresholds,
    pub stage_pd: StagePd,
    /// Operation-profile bands keyed by code (`C1`..`C5`).
    pub profiles: BTreeMap<String, ProfileParameters>,
    /// Parameters used when a profile code is not found in `profiles`.
    pub fallback_profile: ProfileParameters,
    pub lgd: LgdRules,
    pub abusiveness: AbusivenessRules,
}

impl Default for RegulatoryTables {
    fn default() -> Self {
        let band = |horizon: Decimal, multiplier: Decimal, lgd: Decimal| ProfileParameters {
            write_off_horizon_months: horizon,
            pd_multiplier: multiplier,
            base_lgd_pct: lgd,
        };

        let mut profiles = BTreeMap::new();
        profiles.insert("C1".to_string(), band(dec!(36), dec!(0.7), dec!(25)));
        profiles.insert("C2".to_string(), band(dec!(24), dec!(0.85), dec!(40)));
        profiles.insert("C3".to_string(), band(dec!(18), dec!(1.0), dec!(55)));
        profiles.insert("C4".to_string(), band(dec!(18), dec!(1.25), dec!(70)));
        profiles.insert("C5".to_string(), band(dec!(18), dec!(1.5), dec!(85)));

        RegulatoryTables {
            stages: StageThresholds {
                stage_1_max_days: 30,
                stage_2_max_days: 90,
                observation_window_days: 180,
            },
            stage_pd: StagePd {
                stage_1_pct: dec!(2),
                stage_2_pct: dec!(15),
                stage_3_pct: dec!(90),
                stage_3_ramp_start_months: dec!(3),
            },
            profiles,
            fallback_profile: band(dec!(18), dec!(1.0), dec!(65)),
            lgd: LgdRules {
                mitigation_cap: dec!(0.40),
                mitigation_divisor: dec!(1_000_000),
                floor_pct: dec!(5),
                ceiling_pct: dec!(100),
            },
            abusiveness: AbusivenessRules {
                abusive_multiple: dec!(1.5),
                severity_thresholds_pct: [dec!(10), dec!(20), dec!(35), dec!(50), dec!(100)],
            },
        }
    }
}

impl RegulatoryTables {
    /// Parse and validate tables from JSON.
    pub fn from_json(json: &str) -> DebtEngineResult<Self> {
        let tables: RegulatoryTables = serde_json::from_str(json)
            .map_err(|e| DebtEngineError::invalid("tables", e.to_string()))?;
        tables.validate()?;
        Ok(tables)
    }

    /// Look up a profile band. Returns the parameters and whether the code was
    /// found (`false` means the fallback profile was used).
    pub fn profile(&self, code: &str) -> (&ProfileParameters, bool) {
        match self.profiles.get(code.trim()) {
            Some(params) => (params, true),
            None => (&self.fallback_profile, false),
        }
    }

    /// Check internal consistency. Called on every externally loaded table set.
    pub fn validate(&self) -> DebtEngineResult<()> {
        let s = &self.stages;
        if s.stage_1_max_days < 0 || s.stage_2_max_days <= s.stage_1_max_days {
            return Err(DebtEngineError::invalid(
                "stages",
                "Stage thresholds must satisfy 0 <= stage_1_max_days < stage_2_max_days",
            ));
        }
        if s.observation_window_days < 0 {
            return Err(DebtEngineError::invalid(
                "stages.observation_window_days",
                "Observation window cannot be negative",
            ));
        }

        let pd = &self.stage_pd;
        for (field, value) in [
            ("stage_pd.stage_1_pct", pd.stage_1_pct),
            ("stage_pd.stage_2_pct", pd.stage_2_pct),
            ("stage_pd.stage_3_pct", pd.stage_3_pct),
        ] {
            if value < Decimal::ZERO || value > dec!(100) {
                return Err(DebtEngineError::invalid(field, "Base PD must be in [0, 100]"));
            }
        }

        for (code, params) in self
            .profiles
            .iter()
            .map(|(c, p)| (c.as_str(), p))
            .chain(std::iter::once(("fallback_profile", &self.fallback_profile)))
        {
            if params.write_off_horizon_months <= Decimal::ZERO {
                return Err(DebtEngineError::invalid(
                    "profiles",
                    format!("Profile '{code}' write-off horizon must be positive"),
                ));
            }
            if params.pd_multiplier < Decimal::ZERO {
                return Err(DebtEngineError::invalid(
                    "profiles",
                    format!("Profile '{code}' PD multiplier cannot be negative"),
                ));
            }
            if params.base_lgd_pct < Decimal::ZERO || params.base_lgd_pct > dec!(100) {
                return Err(DebtEngineError::invalid(
                    "profiles",
                    format!("Profile '{code}' base LGD must be in [0, 100]"),
                ));
            }
        }

        let lgd = &self.lgd;
        if lgd.mitigation_cap < Decimal::ZERO || lgd.mitigation_cap > Decimal::ONE {
            return Err(DebtEngineError::invalid(
                "lgd.mitigation_cap",
                "Mitigation cap must be in [0, 1]",
            ));
        }
        if lgd.mitigation_divisor <= Decimal::ZERO {
            return Err(DebtEngineError::invalid(
                "lgd.mitigation_divisor",
                "Mitigation divisor must be positive",
            ));
        }
        if lgd.floor_pct < Decimal::ZERO
            || lgd.ceiling_pct > dec!(100)
            || lgd.floor_pct > lgd.ceiling_pct
        {
            return Err(DebtEngineError::invalid(
                "lgd",
                "LGD bounds must satisfy 0 <= floor <= ceiling <= 100",
            ));
        }

        let ab = &self.abusiveness;
        if ab.abusive_multiple <= Decimal::ZERO {
            return Err(DebtEngineError::invalid(
                "abusiveness.abusive_multiple",
                "Abusive multiple must be positive",
            ));
        }
        if ab
            .severity_thresholds_pct
            .windows(2)
            .any(|pair| pair[0] >= pair[1])
        {
            return Err(DebtEngineError::invalid(
                "abusiveness.severity_thresholds_pct",
                "Severity thresholds must be strictly ascending",
            ));
        }

        Ok(())
    }
}
