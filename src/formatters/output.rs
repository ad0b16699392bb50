use crate::maintenance::scheduler::{AssignmentOrder, ScheduleResult, WindowAssignment};
use crate::stack::template::Template;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Output formatter for schedules and templates
pub struct OutputFormatter;

impl OutputFormatter {
    /// Schedule as JSON, in assignment order, with the next start of each window
    pub fn format_schedule(
        schedule: &ScheduleResult,
        order: AssignmentOrder,
        now: DateTime<Utc>,
    ) -> Value {
        json!({
            "summary": {
                "count": schedule.len(),
                "order": order.to_string(),
            },
            "windows": schedule.ordered(order).iter().enumerate().map(|(i, window)| {
                json!({
                    "index": i,
                    "window": window.to_string(),
                    "duration_minutes": window.duration_minutes(),
                    "next_start": window.start.next_occurrence(now).to_rfc3339(),
                })
            }).collect::<Vec<_>>(),
        })
    }

    /// One `index  window  next start` line per window
    pub fn format_schedule_text(
        schedule: &ScheduleResult,
        order: AssignmentOrder,
        now: DateTime<Utc>,
    ) -> String {
        schedule
            .ordered(order)
            .iter()
            .enumerate()
            .map(|(i, window)| {
                format!(
                    "{:>3}  {}  next {}",
                    i,
                    window,
                    window.start.next_occurrence(now).format("%Y-%m-%d %H:%M UTC")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `{"assignments": [{"instance", "window"}]}` in instance order
    pub fn format_assignments(assignments: &[WindowAssignment]) -> Value {
        json!({
            "assignments": assignments.iter().map(|a| {
                json!({
                    "instance": a.target_id,
                    "window": a.window.to_string(),
                })
            }).collect::<Vec<_>>(),
        })
    }

    pub fn format_template(template: &Template, pretty: bool) -> serde_json::Result<String> {
        let value = template.to_json();
        if pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        }
    }
}
