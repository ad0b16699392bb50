//! Staggered maintenance windows for the instances of one cluster.
//!
//! Every instance gets the cluster's base window moved forward by a whole
//! number of steps, so no two instances are patched at the same time.

use super::day::MINUTES_PER_WEEK;
use super::error::MaintenanceError;
use super::window::MaintenanceWindow;
use serde::{Deserialize, Serialize};

/// Order in which a schedule is handed out to instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentOrder {
    /// First instance gets the smallest shift
    Natural,
    /// First instance gets the largest shift
    #[default]
    Reversed,
}

impl std::str::FromStr for AssignmentOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "natural" => Ok(AssignmentOrder::Natural),
            "reversed" | "reverse" => Ok(AssignmentOrder::Reversed),
            _ => Err(anyhow::anyhow!(
                "Unknown assignment order: {}. Valid orders: natural, reversed",
                s
            )),
        }
    }
}

impl std::fmt::Display for AssignmentOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentOrder::Natural => write!(f, "natural"),
            AssignmentOrder::Reversed => write!(f, "reversed"),
        }
    }
}

/// Anything that can receive a maintenance window
pub trait MaintenanceTarget {
    fn target_id(&self) -> &str;
}

impl<T: MaintenanceTarget + ?Sized> MaintenanceTarget for &T {
    fn target_id(&self) -> &str {
        (**self).target_id()
    }
}

/// Largest accepted count: one window per minute of the week
pub const MAX_SHIFT_COUNT: usize = MINUTES_PER_WEEK as usize;

/// A validated scheduling request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftSpec {
    pub base: MaintenanceWindow,
    pub step_minutes: u32,
    pub count: usize,
}

impl ShiftSpec {
    pub fn new(base: MaintenanceWindow, step_minutes: u32, count: i64) -> Result<Self, MaintenanceError> {
        let count = usize::try_from(count)
            .ok()
            .filter(|n| *n <= MAX_SHIFT_COUNT)
            .ok_or(MaintenanceError::InvalidShiftCount(count))?;
        Ok(Self {
            base,
            step_minutes,
            count,
        })
    }

    /// Element `i` is `base` shifted by `step_minutes * (i + 1)`
    pub fn generate(&self) -> ScheduleResult {
        let step = self.step_minutes as u64;
        let windows = (1..=self.count as u64)
            .map(|n| self.base.shift(step.saturating_mul(n)))
            .collect();
        ScheduleResult { windows }
    }
}

/// Windows in increasing-shift order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleResult {
    windows: Vec<MaintenanceWindow>,
}

impl ScheduleResult {
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn windows(&self) -> &[MaintenanceWindow] {
        &self.windows
    }

    pub fn ordered(&self, order: AssignmentOrder) -> Vec<MaintenanceWindow> {
        match order {
            AssignmentOrder::Natural => self.windows.clone(),
            AssignmentOrder::Reversed => self.windows.iter().rev().copied().collect(),
        }
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.windows.iter().map(ToString::to_string).collect()
    }
}

/// Parses `base` and produces `count` staggered windows.
///
/// Fails with `MalformedWindow` before producing anything if `base` does not
/// parse, and with `InvalidShiftCount` if `count` is negative or above
/// [`MAX_SHIFT_COUNT`].
pub fn generate_shifted_windows(
    base: &str,
    step_minutes: u32,
    count: i64,
) -> Result<ScheduleResult, MaintenanceError> {
    let base: MaintenanceWindow = base.parse()?;
    Ok(ShiftSpec::new(base, step_minutes, count)?.generate())
}

/// A window bound to one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowAssignment {
    pub target_id: String,
    pub window: MaintenanceWindow,
}

/// Pairs instances with windows by index after applying `order`
pub fn assign_windows<T: MaintenanceTarget>(
    targets: &[T],
    schedule: &ScheduleResult,
    order: AssignmentOrder,
) -> Result<Vec<WindowAssignment>, MaintenanceError> {
    if targets.len() != schedule.len() {
        return Err(MaintenanceError::CountMismatch {
            instances: targets.len(),
            windows: schedule.len(),
        });
    }

    Ok(targets
        .iter()
        .zip(schedule.ordered(order))
        .map(|(target, window)| WindowAssignment {
            target_id: target.target_id().to_string(),
            window,
        })
        .collect())
}
