use crate::naming::Requester;
use crate::recurrence::{RecurrenceConfig, RecurrenceKind};
use crate::target::{TargetRef, TriggerTag};
use serde::{Deserialize, Serialize};

/// A maintenance request as extracted from the user's message, with the
/// window still in "YYYY-MM-DD HH:MM" form and the recurrence config
/// unvalidated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateMaintenance {
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub trigger_tags: Vec<TriggerTag>,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub description: String,
    pub recurrence_type: String,
    #[serde(default)]
    pub recurrence_config: Option<RecurrenceConfig>,
    #[serde(default)]
    pub ticket_number: Option<String>,
    #[serde(default)]
    pub requester: Option<Requester>,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum Request {
    Create(CreateMaintenance),
    SearchHosts {
        term: String,
    },
    SearchGroups {
        term: String,
    },
    ListMaintenances,
    PreviewRoutine {
        recurrence_type: String,
        #[serde(default)]
        config: RecurrenceConfig,
    },
    Templates,
    Health,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum Response {
    Created(CreatedInfo),
    Error(String),
    Targets(Vec<TargetRef>),
    MaintenanceList(Vec<MaintenanceSummary>),
    Preview {
        valid: bool,
        details: Vec<String>,
        message: String,
    },
    Templates(Vec<RoutineTemplate>),
    Health(HealthInfo),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedInfo {
    pub maintenance_id: String,
    pub name: String,
    pub description: String,
    pub hosts_affected: usize,
    pub groups_affected: usize,
    pub missing_hosts: Vec<String>,
    pub missing_groups: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceSummary {
    pub maintenance_id: String,
    pub name: String,
    pub active_since: String,
    pub active_till: String,
    pub routine_type: String,
    pub ticket_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthInfo {
    pub status: String,
    pub zabbix_connected: bool,
    pub version: String,
}

/// A canned starting point for one routine maintenance kind, with
/// phrasing examples the widget can surface to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineTemplate {
    pub kind: RecurrenceKind,
    pub name: String,
    pub description: String,
    pub examples: Vec<String>,
}

/// The static template set, one entry per routine kind.
pub fn routine_templates() -> Vec<RoutineTemplate> {
    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    vec![
        RoutineTemplate {
            kind: RecurrenceKind::Daily,
            name: "Daily Maintenance".to_string(),
            description: "Maintenance that runs every day".to_string(),
            examples: strings(&[
                "Daily backup at 2 AM for 2 hours with ticket 100-178306",
                "Daily log cleanup at 11:00 PM with ticket 200-8341",
                "Daily service restart from 3-4 AM with ticket 500-43116",
            ]),
        },
        RoutineTemplate {
            kind: RecurrenceKind::Weekly,
            name: "Weekly Maintenance".to_string(),
            description: "Maintenance that runs weekly".to_string(),
            examples: strings(&[
                "Weekly maintenance Sundays 1-3 AM ticket 100-178306",
                "DB update every Friday at 10 PM ticket 200-8341",
                "Full backup every Saturday ticket 500-43116",
            ]),
        },
        RoutineTemplate {
            kind: RecurrenceKind::Monthly,
            name: "Monthly Maintenance".to_string(),
            description: "Maintenance that runs monthly".to_string(),
            examples: strings(&[
                "Maintenance on the first day of each month with ticket 100-178306",
                "DB Optimization on the 15th of each month with ticket 200-8341",
                "Deep cleaning on the first Sunday of the month with ticket 500-43116",
            ]),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_cover_every_routine_kind() {
        let templates = routine_templates();
        let kinds: Vec<RecurrenceKind> = templates.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecurrenceKind::Daily,
                RecurrenceKind::Weekly,
                RecurrenceKind::Monthly
            ]
        );
        for template in &templates {
            assert!(template.kind.is_routine());
            assert!(!template.examples.is_empty());
        }
    }

    #[test]
    fn test_template_kind_serializes_lowercase() {
        let json = serde_json::to_value(routine_templates()).unwrap();
        assert_eq!(json[0]["kind"], "daily");
    }
}
