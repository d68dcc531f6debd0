pub mod descriptor;
pub mod error;
pub mod ipc;
pub mod naming;
pub mod recurrence;
pub mod target;

pub use descriptor::{MaintenanceDescriptor, MaintenancePayload, MaintenanceWindow};
pub use error::ValidationError;
pub use ipc::{
    routine_templates, CreateMaintenance, CreatedInfo, HealthInfo, MaintenanceSummary, Request,
    Response, RoutineTemplate,
};
pub use naming::Requester;
pub use recurrence::{RecurrenceConfig, RecurrenceKind, RecurrenceSpec, TimePeriod};
pub use target::{ExactMatch, ResolutionResult, TargetRef, TargetSet, TriggerTag};

// Production paths (follow FHS - Filesystem Hierarchy Standard)
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/zabmaint/zabmaint.sock";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/zabmaint/config.yaml";
pub const DEFAULT_LOG_FILE: &str = "/var/log/zabmaint/daemon.log";

// Fallback paths for non-root users
pub const USER_SOCKET_PATH: &str = "/tmp/zabmaint.sock";

/// Cap on matches returned by a single wildcard lookup.
pub const FUZZY_LOOKUP_LIMIT: usize = 20;
