use crate::descriptor::MaintenanceWindow;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Zabbix weekday bits: Monday=1 .. Sunday=64.
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Zabbix month bits: January=1 .. December=2048.
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub const WEEKDAY_MASK_MAX: i64 = 127;
pub const MONTH_MASK_MAX: i64 = 4095;
pub const ALL_MONTHS_MASK: u32 = 4095;
pub const MAX_START_OFFSET: i64 = 86_399;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceKind {
    Once,
    Daily,
    Weekly,
    Monthly,
}

impl RecurrenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    pub fn is_routine(&self) -> bool {
        !matches!(self, Self::Once)
    }
}

impl FromStr for RecurrenceKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "once" => Ok(Self::Once),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(ValidationError::UnsupportedType {
                given: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw recurrence configuration as it arrives from the intent JSON.
/// Field names follow the Zabbix timeperiod vocabulary; everything is
/// optional until validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceConfig {
    /// Seconds since midnight.
    pub start_time: Option<i64>,
    /// Duration in seconds.
    pub duration: Option<i64>,
    /// Repeat interval (days/weeks/months), or the week-occurrence
    /// selector for monthly-by-weekday.
    pub every: Option<i64>,
    /// Weekday bitmask, Monday=1 .. Sunday=64.
    pub dayofweek: Option<i64>,
    /// Day of the month, 1..=31.
    pub day: Option<i64>,
    /// Month bitmask, January=1 .. December=2048.
    pub month: Option<i64>,
}

/// A fully validated recurrence. Either produced whole by [`validate`] or
/// not at all; no partially-checked state escapes the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrenceSpec {
    Once,
    Daily {
        start_time: u32,
        duration: u32,
        every: u32,
    },
    Weekly {
        start_time: u32,
        duration: u32,
        dayofweek: u32,
        every: u32,
    },
    MonthlyByDay {
        start_time: u32,
        duration: u32,
        day: u32,
        every: u32,
        month: u32,
    },
    MonthlyByWeekday {
        start_time: u32,
        duration: u32,
        dayofweek: u32,
        /// Week occurrence selector: 1=first .. 5=last. The Zabbix docs
        /// also describe summed combinations ("second and fourth" => 6),
        /// which collide with plain ordinals, so the accepted range stays
        /// 1..=31 and no decoding back to a set is attempted.
        week_occurrence: u32,
        month: u32,
    },
}

impl RecurrenceSpec {
    pub fn kind(&self) -> RecurrenceKind {
        match self {
            Self::Once => RecurrenceKind::Once,
            Self::Daily { .. } => RecurrenceKind::Daily,
            Self::Weekly { .. } => RecurrenceKind::Weekly,
            Self::MonthlyByDay { .. } | Self::MonthlyByWeekday { .. } => RecurrenceKind::Monthly,
        }
    }
}

/// One entry of the `timeperiods` array in a maintenance.create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePeriod {
    pub timeperiod_type: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u32>,
    pub period: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub every: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dayofweek: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
}

/// Decode a weekday bitmask into names, Monday..Sunday order. An empty or
/// zero mask yields an empty list; validation upstream keeps that state
/// from reaching the wire.
pub fn weekday_names_from_mask(mask: u32) -> Vec<&'static str> {
    WEEKDAY_NAMES
        .iter()
        .enumerate()
        .filter(|(bit, _)| mask & (1 << bit) != 0)
        .map(|(_, name)| *name)
        .collect()
}

/// Decode a month bitmask into names, January..December order.
pub fn month_names_from_mask(mask: u32) -> Vec<&'static str> {
    MONTH_NAMES
        .iter()
        .enumerate()
        .filter(|(bit, _)| mask & (1 << bit) != 0)
        .map(|(_, name)| *name)
        .collect()
}

/// Inverse of [`weekday_names_from_mask`]. Unknown names are ignored.
pub fn weekday_mask_from_names(names: &[&str]) -> u32 {
    names
        .iter()
        .filter_map(|n| WEEKDAY_NAMES.iter().position(|w| w == n))
        .fold(0, |mask, bit| mask | (1 << bit))
}

/// Inverse of [`month_names_from_mask`]. Unknown names are ignored.
pub fn month_mask_from_names(names: &[&str]) -> u32 {
    names
        .iter()
        .filter_map(|n| MONTH_NAMES.iter().position(|m| m == n))
        .fold(0, |mask, bit| mask | (1 << bit))
}

/// Human name for a week-occurrence selector (monthly-by-weekday).
pub fn week_occurrence_name(occurrence: u32) -> String {
    match occurrence {
        1 => "first".to_string(),
        2 => "second".to_string(),
        3 => "third".to_string(),
        4 => "fourth".to_string(),
        5 => "last".to_string(),
        other => format!("week {}", other),
    }
}

/// Validate a raw recurrence config for the given kind.
///
/// Independent checks accumulate, so a config that is wrong in several
/// places reports all of them in one pass. A spec is only produced when
/// the error list is empty.
pub fn validate(
    kind: RecurrenceKind,
    config: &RecurrenceConfig,
) -> Result<RecurrenceSpec, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let spec = match kind {
        // A one-time maintenance carries no recurrence config; only the
        // active window matters and the builder checks that.
        RecurrenceKind::Once => Some(RecurrenceSpec::Once),

        RecurrenceKind::Daily => {
            let start_time = check_start_time(config, &mut errors).unwrap_or(0);
            let duration = check_duration(config, &mut errors).unwrap_or(3600);
            let every = check_every(config, &mut errors).unwrap_or(1);
            Some(RecurrenceSpec::Daily {
                start_time,
                duration,
                every,
            })
        }

        RecurrenceKind::Weekly => {
            let start_time = check_start_time(config, &mut errors).unwrap_or(0);
            let duration = check_duration(config, &mut errors).unwrap_or(3600);
            let every = check_every(config, &mut errors).unwrap_or(1);
            let dayofweek = match config.dayofweek {
                Some(mask) if (1..=WEEKDAY_MASK_MAX).contains(&mask) => Some(mask as u32),
                Some(mask) => {
                    errors.push(ValidationError::OutOfRange {
                        field: "dayofweek",
                        value: mask,
                        allowed: "1..=127",
                    });
                    None
                }
                None => {
                    errors.push(ValidationError::MissingField {
                        field: "dayofweek",
                        kind: "weekly",
                    });
                    None
                }
            };
            dayofweek.map(|dayofweek| RecurrenceSpec::Weekly {
                start_time,
                duration,
                dayofweek,
                every,
            })
        }

        RecurrenceKind::Monthly => validate_monthly(config, &mut errors),
    };

    match spec {
        Some(spec) if errors.is_empty() => Ok(spec),
        _ => Err(errors),
    }
}

/// Monthly is stricter than daily/weekly: start_time and duration are
/// mandatory, and exactly one of `day` / `dayofweek` must be present.
fn validate_monthly(
    config: &RecurrenceConfig,
    errors: &mut Vec<ValidationError>,
) -> Option<RecurrenceSpec> {
    let start_time = match config.start_time {
        Some(s) if (0..=MAX_START_OFFSET).contains(&s) => Some(s as u32),
        Some(s) => {
            errors.push(ValidationError::OutOfRange {
                field: "start_time",
                value: s,
                allowed: "0..=86399",
            });
            None
        }
        None => {
            errors.push(ValidationError::MissingField {
                field: "start_time",
                kind: "monthly",
            });
            None
        }
    };

    let duration = match config.duration {
        Some(_) => check_duration(config, errors),
        None => {
            errors.push(ValidationError::MissingField {
                field: "duration",
                kind: "monthly",
            });
            None
        }
    };

    let month = match config.month {
        Some(m) if (1..=MONTH_MASK_MAX).contains(&m) => m as u32,
        Some(m) => {
            errors.push(ValidationError::OutOfRange {
                field: "month",
                value: m,
                allowed: "1..=4095",
            });
            ALL_MONTHS_MASK
        }
        None => ALL_MONTHS_MASK,
    };

    let selector = match (config.day, config.dayofweek) {
        (Some(_), Some(_)) => {
            errors.push(ValidationError::MutuallyExclusive {
                first: "day",
                second: "dayofweek",
            });
            None
        }
        (None, None) => {
            errors.push(ValidationError::MissingField {
                field: "day or dayofweek",
                kind: "monthly",
            });
            None
        }
        (Some(day), None) => {
            if !(1..=31).contains(&day) {
                errors.push(ValidationError::OutOfRange {
                    field: "day",
                    value: day,
                    allowed: "1..=31",
                });
                None
            } else {
                let every = check_every(config, errors).unwrap_or(1);
                Some((Some((day as u32, every)), None))
            }
        }
        (None, Some(mask)) => {
            if !(1..=WEEKDAY_MASK_MAX).contains(&mask) {
                errors.push(ValidationError::OutOfRange {
                    field: "dayofweek",
                    value: mask,
                    allowed: "1..=127",
                });
                None
            } else {
                // `every` doubles as the week-occurrence selector here:
                // 1=first .. 5=last, defaulting to the first week.
                let occurrence = match config.every {
                    Some(o) if (1..=31).contains(&o) => Some(o as u32),
                    Some(o) => {
                        errors.push(ValidationError::OutOfRange {
                            field: "every",
                            value: o,
                            allowed: "1=first, 2=second, 3=third, 4=fourth, 5=last, or combinations",
                        });
                        None
                    }
                    None => Some(1),
                };
                occurrence.map(|o| (None, Some((mask as u32, o))))
            }
        }
    };

    let (start_time, duration) = (start_time?, duration?);
    match selector? {
        (Some((day, every)), None) => Some(RecurrenceSpec::MonthlyByDay {
            start_time,
            duration,
            day,
            every,
            month,
        }),
        (None, Some((dayofweek, week_occurrence))) => Some(RecurrenceSpec::MonthlyByWeekday {
            start_time,
            duration,
            dayofweek,
            week_occurrence,
            month,
        }),
        _ => None,
    }
}

fn check_start_time(config: &RecurrenceConfig, errors: &mut Vec<ValidationError>) -> Option<u32> {
    match config.start_time {
        Some(s) if (0..=MAX_START_OFFSET).contains(&s) => Some(s as u32),
        Some(s) => {
            errors.push(ValidationError::OutOfRange {
                field: "start_time",
                value: s,
                allowed: "0..=86399",
            });
            None
        }
        None => None,
    }
}

fn check_duration(config: &RecurrenceConfig, errors: &mut Vec<ValidationError>) -> Option<u32> {
    match config.duration {
        // try_from catches positive values beyond u32; a plain cast
        // would wrap them into a zero-length period.
        Some(d) if d > 0 => match u32::try_from(d) {
            Ok(d) => Some(d),
            Err(_) => {
                errors.push(ValidationError::OutOfRange {
                    field: "duration",
                    value: d,
                    allowed: "1..=4294967295",
                });
                None
            }
        },
        Some(d) => {
            errors.push(ValidationError::OutOfRange {
                field: "duration",
                value: d,
                allowed: "a positive number of seconds",
            });
            None
        }
        None => None,
    }
}

fn check_every(config: &RecurrenceConfig, errors: &mut Vec<ValidationError>) -> Option<u32> {
    match config.every {
        Some(e) if e >= 1 => match u32::try_from(e) {
            Ok(e) => Some(e),
            Err(_) => {
                errors.push(ValidationError::OutOfRange {
                    field: "every",
                    value: e,
                    allowed: "1..=4294967295",
                });
                None
            }
        },
        Some(e) => {
            errors.push(ValidationError::OutOfRange {
                field: "every",
                value: e,
                allowed: "1 or greater",
            });
            None
        }
        None => None,
    }
}

/// Map a validated spec onto the wire timeperiod. The active window is
/// only consulted for one-time maintenances, where the period is the
/// whole window.
pub fn build_time_period(spec: &RecurrenceSpec, window: &MaintenanceWindow) -> TimePeriod {
    match *spec {
        RecurrenceSpec::Once => TimePeriod {
            timeperiod_type: 0,
            start_date: Some(window.active_since),
            start_time: None,
            period: window.active_till - window.active_since,
            every: None,
            dayofweek: None,
            day: None,
            month: None,
        },
        RecurrenceSpec::Daily {
            start_time,
            duration,
            every,
        } => TimePeriod {
            timeperiod_type: 2,
            start_date: None,
            start_time: Some(start_time),
            period: duration as i64,
            every: Some(every),
            dayofweek: None,
            day: None,
            month: None,
        },
        RecurrenceSpec::Weekly {
            start_time,
            duration,
            dayofweek,
            every,
        } => TimePeriod {
            timeperiod_type: 3,
            start_date: None,
            start_time: Some(start_time),
            period: duration as i64,
            every: Some(every),
            dayofweek: Some(dayofweek),
            day: None,
            month: None,
        },
        RecurrenceSpec::MonthlyByDay {
            start_time,
            duration,
            day,
            every,
            month,
        } => TimePeriod {
            timeperiod_type: 4,
            start_date: None,
            start_time: Some(start_time),
            period: duration as i64,
            every: Some(every),
            dayofweek: None,
            day: Some(day),
            month: Some(month),
        },
        RecurrenceSpec::MonthlyByWeekday {
            start_time,
            duration,
            dayofweek,
            week_occurrence,
            month,
        } => TimePeriod {
            timeperiod_type: 4,
            start_date: None,
            start_time: Some(start_time),
            period: duration as i64,
            every: Some(week_occurrence),
            dayofweek: Some(dayofweek),
            day: None,
            month: Some(month),
        },
    }
}

/// Human-readable detail lines for a validated recurrence, used by the
/// config preview and the creation summary.
pub fn describe(spec: &RecurrenceSpec) -> Vec<String> {
    let mut details = Vec::new();

    match *spec {
        RecurrenceSpec::Once => {}
        RecurrenceSpec::Daily {
            start_time,
            duration,
            every,
        } => {
            details.push(format!("Every {} day(s)", every));
            details.push(start_time_line(start_time));
            details.push(duration_line(duration));
        }
        RecurrenceSpec::Weekly {
            start_time,
            duration,
            dayofweek,
            ..
        } => {
            details.push(format!(
                "Days: {} (bitmask: {})",
                weekday_names_from_mask(dayofweek).join(", "),
                dayofweek
            ));
            details.push(start_time_line(start_time));
            details.push(duration_line(duration));
        }
        RecurrenceSpec::MonthlyByDay {
            start_time,
            duration,
            day,
            month,
            ..
        } => {
            details.push(format!("Day of the month: {}", day));
            details.push(month_line(month));
            details.push(start_time_line(start_time));
            details.push(duration_line(duration));
        }
        RecurrenceSpec::MonthlyByWeekday {
            start_time,
            duration,
            dayofweek,
            week_occurrence,
            month,
        } => {
            details.push(format!(
                "Days: {} (bitmask: {})",
                weekday_names_from_mask(dayofweek).join(", "),
                dayofweek
            ));
            details.push(format!(
                "Week: {} (value: {})",
                week_occurrence_name(week_occurrence),
                week_occurrence
            ));
            details.push(month_line(month));
            details.push(start_time_line(start_time));
            details.push(duration_line(duration));
        }
    }

    details
}

fn month_line(month: u32) -> String {
    format!(
        "Months: {} (bitmask: {})",
        month_names_from_mask(month).join(", "),
        month
    )
}

fn start_time_line(start_time: u32) -> String {
    let hours = start_time / 3600;
    let minutes = (start_time % 3600) / 60;
    format!("Start time: {:02}:{:02} ({}s)", hours, minutes, start_time)
}

fn duration_line(duration: u32) -> String {
    let hours = duration / 3600;
    let minutes = (duration % 3600) / 60;
    format!("Duration: {}h {}m ({}s)", hours, minutes, duration)
}
