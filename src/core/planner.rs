use crate::config::{self, Config};
use crate::maintenance::scheduler::{
    assign_windows, AssignmentOrder, ScheduleResult, ShiftSpec, WindowAssignment,
};
use crate::maintenance::window::MaintenanceWindow;
use crate::shared::logging;
use crate::stack::model::StackSpec;
use crate::stack::template::{render_template, Template};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error(transparent)]
    Maintenance(#[from] crate::maintenance::error::MaintenanceError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Ad-hoc schedule request; unset fields fall back to the configured stack
#[derive(Debug, Clone, Default)]
pub struct WindowRequest {
    pub base: Option<String>,
    pub step_minutes: Option<u32>,
    pub count: Option<i64>,
}

pub struct Planner {
    config: Config,
}

impl Planner {
    pub fn new(config_path: Option<String>) -> anyhow::Result<Self> {
        let config = match config_path {
            Some(path) => {
                let path_buf = PathBuf::from(&path);
                if path_buf.is_absolute() {
                    logging::info(&format!("Using absolute config path: {}", path));
                    config::init_from_path(&path)?
                } else {
                    let abs_path = std::env::current_dir()?.join(&path);
                    logging::info(&format!(
                        "Converting relative config path to absolute: {}",
                        abs_path.display()
                    ));
                    config::init_from_path(abs_path.to_str().unwrap_or(&path))?
                }
            }
            None => config::init_default()?,
        };

        Ok(Self::with_config(config))
    }

    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stack(&self) -> &StackSpec {
        &self.config.stack
    }

    pub fn order(&self) -> AssignmentOrder {
        self.config.stack.instance_maintenance.order
    }

    /// One window per cluster instance, in increasing-shift order
    pub fn schedule(&self) -> Result<ScheduleResult, PlannerError> {
        let stack = self.stack();
        let spec = ShiftSpec::new(
            stack.aurora.preferred_maintenance_window,
            stack.instance_maintenance.step_minutes,
            stack.aurora.instances().len() as i64,
        )?;
        Ok(spec.generate())
    }

    /// Schedule for `request`, defaulting to the configured cluster
    pub fn schedule_for(&self, request: &WindowRequest) -> Result<ScheduleResult, PlannerError> {
        let stack = self.stack();
        let base: MaintenanceWindow = match &request.base {
            Some(base) => base.parse()?,
            None => stack.aurora.preferred_maintenance_window,
        };
        let step = request
            .step_minutes
            .unwrap_or(stack.instance_maintenance.step_minutes);
        let count = request
            .count
            .unwrap_or(stack.aurora.instances().len() as i64);

        logging::debug(&format!(
            "Generating {} windows from {} every {} minutes",
            count, base, step
        ));
        Ok(ShiftSpec::new(base, step, count)?.generate())
    }

    /// Windows bound to the cluster's instances, writer first
    pub fn assignments(&self) -> Result<Vec<WindowAssignment>, PlannerError> {
        let schedule = self.schedule()?;
        let instances = self.stack().aurora.instances();
        let assignments = assign_windows(&instances, &schedule, self.order())?;

        self.warn_backup_overlap(&assignments);
        Ok(assignments)
    }

    fn warn_backup_overlap(&self, assignments: &[WindowAssignment]) {
        let backup = &self.stack().aurora.backup.preferred_window;
        for assignment in assignments {
            if backup.overlaps(&assignment.window) {
                logging::warn(&format!(
                    "Maintenance window {} of '{}' overlaps the backup window {}",
                    assignment.window, assignment.target_id, backup
                ));
            }
        }
    }

    pub fn synthesize(&self) -> Result<Template, PlannerError> {
        let assignments = self.assignments()?;
        for assignment in &assignments {
            logging::info(&format!(
                "{} -> {}",
                assignment.target_id, assignment.window
            ));
        }
        Ok(render_template(self.stack(), &assignments)?)
    }
}
