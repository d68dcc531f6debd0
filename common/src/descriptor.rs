use crate::error::ValidationError;
use crate::recurrence::{build_time_period, RecurrenceSpec, TimePeriod};
use crate::target::{TargetSet, TriggerTag};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

pub const WINDOW_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// The active window of a maintenance, in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub active_since: i64,
    pub active_till: i64,
}

impl MaintenanceWindow {
    /// Parse "YYYY-MM-DD HH:MM" strings in local time, the format the
    /// intent extraction emits.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self {
            active_since: parse_local(start)?,
            active_till: parse_local(end)?,
        })
    }
}

fn parse_local(s: &str) -> Result<i64> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), WINDOW_TIME_FORMAT)
        .with_context(|| format!("invalid date format: {:?} (expected YYYY-MM-DD HH:MM)", s))?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("ambiguous local time: {:?}", s))?;
    Ok(local.timestamp())
}

/// The fully validated, assembled representation of one maintenance,
/// ready for transmission. Never mutated after assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceDescriptor {
    pub name: String,
    pub description: String,
    pub active_since: i64,
    pub active_till: i64,
    pub recurrence: RecurrenceSpec,
    pub targets: TargetSet,
    pub ticket_number: Option<String>,
}

impl MaintenanceDescriptor {
    /// Compose the final descriptor. Pure composition; the only failures
    /// are an inverted window and a target set with nothing in it.
    pub fn assemble(
        window: MaintenanceWindow,
        recurrence: RecurrenceSpec,
        targets: TargetSet,
        name: String,
        description: String,
        ticket_number: Option<String>,
    ) -> Result<Self, ValidationError> {
        if window.active_till <= window.active_since {
            return Err(ValidationError::InvalidWindow {
                active_since: window.active_since,
                active_till: window.active_till,
            });
        }
        if targets.is_empty() {
            return Err(ValidationError::EmptyTargets);
        }

        Ok(Self {
            name,
            description,
            active_since: window.active_since,
            active_till: window.active_till,
            recurrence,
            targets,
            ticket_number,
        })
    }

    pub fn window(&self) -> MaintenanceWindow {
        MaintenanceWindow {
            active_since: self.active_since,
            active_till: self.active_till,
        }
    }

    /// Project the descriptor onto the maintenance.create wire shape.
    pub fn to_payload(&self) -> MaintenancePayload {
        MaintenancePayload {
            name: self.name.clone(),
            description: self.description.clone(),
            active_since: self.active_since,
            active_till: self.active_till,
            // 0 = with data collection
            maintenance_type: 0,
            timeperiods: vec![build_time_period(&self.recurrence, &self.window())],
            hosts: self
                .targets
                .hosts
                .iter()
                .map(|h| HostId {
                    hostid: h.id.clone(),
                })
                .collect(),
            groups: self
                .targets
                .groups
                .iter()
                .map(|g| GroupId {
                    groupid: g.id.clone(),
                })
                .collect(),
            tags: self.targets.trigger_tags.clone(),
        }
    }
}

/// Parameters for maintenance.create, matching the Zabbix 7.2 schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenancePayload {
    pub name: String,
    pub description: String,
    pub active_since: i64,
    pub active_till: i64,
    pub maintenance_type: u32,
    pub timeperiods: Vec<TimePeriod>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub hosts: Vec<HostId>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub groups: Vec<GroupId>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<TriggerTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostId {
    pub hostid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupId {
    pub groupid: String,
}
