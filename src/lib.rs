// Re-export modules for testing and external use
pub mod maintenance {
    pub mod day;
    pub mod error;
    pub mod scheduler;
    pub mod window;

    // Re-export commonly used items
    pub use day::{DayOfWeek, DAYS};
    pub use error::MaintenanceError;
    pub use scheduler::{
        assign_windows, generate_shifted_windows, AssignmentOrder, MaintenanceTarget,
        ScheduleResult, ShiftSpec, WindowAssignment,
    };
    pub use window::{shift_day_time, DailyWindow, DayTime, MaintenanceWindow};
}

pub mod stack {
    pub mod model;
    pub mod template;

    pub use model::{AuroraClusterSpec, DbInstanceSpec, InstanceRole, StackSpec};
    pub use template::{render_template, CfnResource, Template};
}

pub mod formatters {
    pub mod output;

    pub use output::OutputFormatter;
}

pub mod shared {
    pub mod logging;
}

pub mod core {
    pub mod planner;
}

pub mod config;

// Re-export commonly used types for easier testing and external use
pub use core::planner::{Planner, PlannerError, WindowRequest};
pub use maintenance::{generate_shifted_windows, shift_day_time, MaintenanceError};
