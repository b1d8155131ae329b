//! Three-stage risk classification.
//!
//! Base rule on days in arrears (defaults): Stage 1 up to 30 days, Stage 2
//! from 31 to 90, Stage 3 above 90. A restructured contract still inside its
//! observation window (180 days after restructuring) is floored at Stage 2.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::days_between;
use crate::error::DebtEngineError;
use crate::tables::{RegulatoryTables, StageThresholds};
use crate::DebtEngineResult;

/// Risk stage, ordered from performing to non-performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "stage_1")]
    Stage1,
    #[serde(rename = "stage_2")]
    Stage2,
    #[serde(rename = "stage_3")]
    Stage3,
}

impl Stage {
    pub fn number(self) -> u8 {
        match self {
            Stage::Stage1 => 1,
            Stage::Stage2 => 2,
            Stage::Stage3 => 3,
        }
    }

    /// Loss horizon the stage implies.
    pub fn horizon(self) -> &'static str {
        match self {
            Stage::Stage1 => "12-month",
            Stage::Stage2 | Stage::Stage3 => "lifetime",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage {}", self.number())
    }
}

/// Arrears and restructuring status of one exposure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArrearsState {
    pub days_in_arrears: i64,
    #[serde(default)]
    pub is_restructured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restructuring_date: Option<NaiveDate>,
}

/// Position of the reference date relative to the post-restructuring
/// observation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationWindow {
    /// False when the contract is not restructured or carries no date.
    pub evaluated: bool,
    pub inside: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_days: Option<i64>,
    /// Window length minus elapsed days, floored at zero.
    pub days_remaining: i64,
}

impl ObservationWindow {
    fn not_evaluated() -> Self {
        ObservationWindow {
            evaluated: false,
            inside: false,
            elapsed_days: None,
            days_remaining: 0,
        }
    }
}

/// Stage with the reasoning behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageClassification {
    /// Stage implied by arrears alone.
    pub base_stage: Stage,
    /// Final stage after the observation-window floor.
    pub stage: Stage,
    /// True when the observation window raised the stage.
    pub floored_by_restructuring: bool,
    pub observation: ObservationWindow,
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Classify an exposure into a stage.
///
/// Negative arrears are a caller error: upstream code clamps
/// `reference − last_payment` to zero before calling.
pub fn classify(
    days_in_arrears: i64,
    is_restructured: bool,
    restructuring_date: Option<NaiveDate>,
    reference_date: NaiveDate,
    tables: &RegulatoryTables,
) -> DebtEngineResult<Stage> {
    let state = ArrearsState {
        days_in_arrears,
        is_restructured,
        restructuring_date,
    };
    Ok(classify_detailed(&state, reference_date, tables)?.stage)
}

/// Classify and report the base stage and observation-window state.
pub fn classify_detailed(
    state: &ArrearsState,
    reference_date: NaiveDate,
    tables: &RegulatoryTables,
) -> DebtEngineResult<StageClassification> {
    if state.days_in_arrears < 0 {
        return Err(DebtEngineError::invalid(
            "days_in_arrears",
            format!(
                "Days in arrears cannot be negative (got {}); clamp before classifying",
                state.days_in_arrears
            ),
        ));
    }

    let base_stage = base_stage(state.days_in_arrears, &tables.stages);
    let observation = observation_window(
        state.is_restructured,
        state.restructuring_date,
        reference_date,
        tables,
    );

    let stage = if observation.inside {
        base_stage.max(Stage::Stage2)
    } else {
        base_stage
    };

    Ok(StageClassification {
        base_stage,
        stage,
        floored_by_restructuring: stage != base_stage,
        observation,
    })
}

/// Where `reference_date` falls in the post-restructuring observation window.
pub fn observation_window(
    is_restructured: bool,
    restructuring_date: Option<NaiveDate>,
    reference_date: NaiveDate,
    tables: &RegulatoryTables,
) -> ObservationWindow {
    let restructured_on = match (is_restructured, restructuring_date) {
        (true, Some(date)) => date,
        _ => return ObservationWindow::not_evaluated(),
    };

    let window = tables.stages.observation_window_days;
    // A restructuring dated after the reference date has just started its window
    let elapsed = days_between(restructured_on, reference_date).max(0);

    ObservationWindow {
        evaluated: true,
        inside: elapsed <= window,
        elapsed_days: Some(elapsed),
        days_remaining: (window - elapsed).max(0),
    }
}

fn base_stage(days_in_arrears: i64, thresholds: &StageThresholds) -> Stage {
    if days_in_arrears <= thresholds.stage_1_max_days {
        Stage::Stage1
    } else if days_in_arrears <= thresholds.stage_2_max_days {
        Stage::Stage2
    } else {
        Stage::Stage3
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
