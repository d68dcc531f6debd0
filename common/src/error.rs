use thiserror::Error;

/// Validation failures for recurrence configs and assembled maintenances.
///
/// Every variant carries the offending field and value so the caller can
/// render a precise message without re-inspecting the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `{field}` for {kind} maintenance")]
    MissingField { field: &'static str, kind: &'static str },

    #[error("`{field}` out of range: got {value}, allowed {allowed}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        allowed: &'static str,
    },

    #[error("`{first}` and `{second}` are mutually exclusive; specify exactly one")]
    MutuallyExclusive {
        first: &'static str,
        second: &'static str,
    },

    #[error("recurrence type not supported: {given}")]
    UnsupportedType { given: String },

    #[error("the end date must be after the start date (active_since={active_since}, active_till={active_till})")]
    InvalidWindow { active_since: i64, active_till: i64 },

    #[error("no valid hosts or groups for the maintenance")]
    EmptyTargets,
}
