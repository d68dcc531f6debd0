use crate::resolver::{Inventory, Resolver};
use crate::zabbix::ZabbixClient;
use chrono::{Local, TimeZone};
use common::descriptor::WINDOW_TIME_FORMAT;
use common::{
    naming, recurrence, CreateMaintenance, CreatedInfo, HealthInfo, MaintenanceDescriptor,
    MaintenanceSummary, MaintenanceWindow, RecurrenceKind, RecurrenceSpec, Request, Response,
    TargetSet, ValidationError,
};
use serde_json::Value;
use std::sync::Arc;

/// Ties the pure core together: validate the recurrence, resolve the
/// targets, derive the naming, assemble the descriptor and hand it to
/// Zabbix. One fresh pass per request, nothing retained in between.
pub struct MaintenanceService {
    client: Arc<ZabbixClient>,
    resolver: Resolver,
}

impl MaintenanceService {
    pub fn new(client: Arc<ZabbixClient>, resolver: Resolver) -> Self {
        Self { client, resolver }
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Create(req) => self.create(req).await,
            Request::SearchHosts { term } => self.search_hosts(&term).await,
            Request::SearchGroups { term } => self.search_groups(&term).await,
            Request::ListMaintenances => self.list().await,
            Request::PreviewRoutine {
                recurrence_type,
                config,
            } => preview_routine(&recurrence_type, &config),
            Request::Templates => Response::Templates(common::routine_templates()),
            Request::Health => self.health().await,
        }
    }

    async fn create(&self, req: CreateMaintenance) -> Response {
        // The widget authenticates against Zabbix; over the local socket
        // we verify the requester's userid when one is supplied.
        if let Some(userid) = req
            .requester
            .as_ref()
            .and_then(|r| r.userid.as_deref())
            .filter(|u| !u.is_empty())
        {
            match self.client.user_exists(userid).await {
                Ok(true) => {}
                Ok(false) => {
                    return Response::Error(format!(
                        "Unauthorized: userid {} is not a known Zabbix user",
                        userid
                    ))
                }
                Err(e) => return Response::Error(format!("User validation failed: {:#}", e)),
            }
        } else {
            log::warn!("Create request without requester identity");
        }

        let (window, kind, spec) = match validate_request(&req) {
            Ok(validated) => validated,
            Err(message) => return Response::Error(message),
        };

        log::info!(
            "Processing {} maintenance request: {} host name(s), {} group name(s), {} tag(s)",
            kind,
            req.hosts.len(),
            req.groups.len(),
            req.trigger_tags.len()
        );

        let hosts = self.resolver.resolve_hosts(&req.hosts).await;
        let groups = self.resolver.resolve_groups(&req.groups).await;
        let tag_hosts = self.resolver.resolve_by_tags(&req.trigger_tags).await;

        let mut targets = TargetSet {
            trigger_tags: req.trigger_tags.clone(),
            ..Default::default()
        };
        targets.add_hosts(hosts.found.clone());
        targets.add_hosts(tag_hosts);
        targets.add_groups(groups.found.clone());

        if hosts.has_missing() || groups.has_missing() {
            log::warn!(
                "Partial resolution; missing hosts: {:?}, missing groups: {:?}",
                hosts.missing,
                groups.missing
            );
        }

        // Back-fill the ticket from the free text once, so the name and
        // the description agree on it.
        let ticket = req
            .ticket_number
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .or_else(|| naming::extract_ticket(&req.description));

        let name = naming::build_name(
            ticket.as_deref(),
            kind,
            &targets.host_names(),
            &targets.group_names(),
        );
        let description =
            naming::build_description(ticket.as_deref(), &req.description, req.requester.as_ref());

        let descriptor = match MaintenanceDescriptor::assemble(
            window,
            spec,
            targets,
            name,
            description,
            ticket,
        ) {
            Ok(descriptor) => descriptor,
            Err(ValidationError::EmptyTargets) => {
                return Response::Error(format!(
                    "No valid hosts or groups found (unresolved hosts: {:?}, groups: {:?})",
                    hosts.missing, groups.missing
                ))
            }
            Err(e) => return Response::Error(e.to_string()),
        };

        log::info!("Creating maintenance: {}", descriptor.name);

        let maintenance_id = match self.client.create_maintenance(&descriptor.to_payload()).await {
            Ok(id) => id,
            Err(e) => {
                log::error!("maintenance.create failed: {:#}", e);
                return Response::Error(format!("Zabbix error: {:#}", e));
            }
        };

        log::info!("Maintenance created with ID: {}", maintenance_id);

        let message = creation_summary(&descriptor, &req, &hosts.missing, &groups.missing);
        Response::Created(CreatedInfo {
            maintenance_id,
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            hosts_affected: descriptor.targets.hosts.len(),
            groups_affected: descriptor.targets.groups.len(),
            missing_hosts: hosts.missing,
            missing_groups: groups.missing,
            message,
        })
    }

    async fn search_hosts(&self, term: &str) -> Response {
        let term = term.trim();
        if term.is_empty() {
            return Response::Error("The search term cannot be empty".to_string());
        }
        match self.client.fuzzy_hosts(term, common::FUZZY_LOOKUP_LIMIT).await {
            Ok(hosts) => Response::Targets(hosts),
            Err(e) => Response::Error(format!("Host search failed: {:#}", e)),
        }
    }

    async fn search_groups(&self, term: &str) -> Response {
        let term = term.trim();
        if term.is_empty() {
            return Response::Error("The search term cannot be empty".to_string());
        }
        match self.client.fuzzy_groups(term, common::FUZZY_LOOKUP_LIMIT).await {
            Ok(groups) => Response::Targets(groups),
            Err(e) => Response::Error(format!("Group search failed: {:#}", e)),
        }
    }

    async fn list(&self) -> Response {
        match self.client.list_maintenances().await {
            Ok(rows) => Response::MaintenanceList(rows.iter().map(summarize).collect()),
            Err(e) => Response::Error(format!("Error getting maintenances: {:#}", e)),
        }
    }

    async fn health(&self) -> Response {
        let connected = match self.client.ping().await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Zabbix connection check failed: {:#}", e);
                false
            }
        };
        Response::Health(HealthInfo {
            status: if connected { "healthy" } else { "degraded" }.to_string(),
            zabbix_connected: connected,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

/// Parse the window, the recurrence kind and the recurrence config. The
/// validated recurrence is produced whole or not at all.
fn validate_request(
    req: &CreateMaintenance,
) -> Result<(MaintenanceWindow, RecurrenceKind, RecurrenceSpec), String> {
    let window = MaintenanceWindow::parse(&req.start_time, &req.end_time)
        .map_err(|e| format!("{:#}", e))?;

    let kind: RecurrenceKind = req
        .recurrence_type
        .parse()
        .map_err(|e: ValidationError| e.to_string())?;

    if kind.is_routine() && req.recurrence_config.is_none() {
        return Err(format!(
            "Routine maintenance configuration is missing for {} maintenance",
            kind
        ));
    }

    let config = req.recurrence_config.clone().unwrap_or_default();
    let spec = recurrence::validate(kind, &config).map_err(join_errors)?;

    Ok((window, kind, spec))
}

fn join_errors(errors: Vec<ValidationError>) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate a routine config without touching Zabbix and decode it into
/// human-readable detail lines.
fn preview_routine(recurrence_type: &str, config: &common::RecurrenceConfig) -> Response {
    let kind = match recurrence_type.parse::<RecurrenceKind>() {
        Ok(kind) => kind,
        Err(e) => return Response::Error(e.to_string()),
    };

    match recurrence::validate(kind, config) {
        Ok(spec) => Response::Preview {
            valid: true,
            details: recurrence::describe(&spec),
            message: format!("Valid {} configuration", kind),
        },
        Err(errors) => Response::Preview {
            valid: false,
            details: errors.iter().map(|e| e.to_string()).collect(),
            message: format!("Invalid {} configuration", kind),
        },
    }
}

/// The multi-line human summary returned after a successful creation.
fn creation_summary(
    descriptor: &MaintenanceDescriptor,
    req: &CreateMaintenance,
    missing_hosts: &[String],
    missing_groups: &[String],
) -> String {
    let mut lines = vec![
        "Maintenance created successfully!".to_string(),
        String::new(),
        "Details:".to_string(),
        format!("- Name: {}", descriptor.name),
        format!("- Start: {}", req.start_time),
        format!("- End: {}", req.end_time),
        format!("- Affected hosts: {}", descriptor.targets.hosts.len()),
        format!("- Groups affected: {}", descriptor.targets.groups.len()),
    ];

    let kind = descriptor.recurrence.kind();
    if kind.is_routine() {
        lines.push(format!("- Type: Routine ({})", kind));
        for detail in recurrence::describe(&descriptor.recurrence) {
            lines.push(format!("- {}", detail));
        }
    }

    if let Some(ticket) = &descriptor.ticket_number {
        lines.push(format!("- Ticket: {}", ticket));
    }

    if let Some(requester) = &req.requester {
        lines.push(format!("- Requested By: {}", requester.display_name()));
    }

    if !missing_hosts.is_empty() {
        lines.push(format!("- Not found, hosts: {}", missing_hosts.join(", ")));
    }
    if !missing_groups.is_empty() {
        lines.push(format!("- Not found, groups: {}", missing_groups.join(", ")));
    }

    lines.push(String::new());
    lines.push("The maintenance is up and running.".to_string());
    lines.join("\n")
}

/// One maintenance.get row condensed for listing. Zabbix returns numeric
/// fields as strings, so both encodings are accepted.
fn summarize(row: &Value) -> MaintenanceSummary {
    let name = row["name"].as_str().unwrap_or_default().to_string();
    let description = row["description"].as_str().unwrap_or_default();

    let routine_type = row["timeperiods"][0]
        .get("timeperiod_type")
        .and_then(field_i64)
        .map(|t| match t {
            2 => "daily",
            3 => "weekly",
            4 => "monthly",
            _ => "once",
        })
        .unwrap_or("once")
        .to_string();

    let ticket_number = naming::extract_ticket(&format!("{} {}", name, description))
        .unwrap_or_default();

    MaintenanceSummary {
        maintenance_id: row["maintenanceid"].as_str().unwrap_or_default().to_string(),
        name,
        active_since: format_epoch(row.get("active_since").and_then(field_i64)),
        active_till: format_epoch(row.get("active_till").and_then(field_i64)),
        routine_type,
        ticket_number,
    }
}

fn field_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn format_epoch(epoch: Option<i64>) -> String {
    epoch
        .and_then(|e| Local.timestamp_opt(e, 0).earliest())
        .map(|dt| dt.format(WINDOW_TIME_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{RecurrenceConfig, TargetRef};
    use serde_json::json;

    fn base_request() -> CreateMaintenance {
        CreateMaintenance {
            hosts: vec!["srv-web01".to_string()],
            start_time: "2025-08-24 10:00".to_string(),
            end_time: "2025-08-24 16:50".to_string(),
            description: "Patch servers".to_string(),
            recurrence_type: "once".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_request_once() {
        let (window, kind, spec) = validate_request(&base_request()).unwrap();
        assert!(window.active_till > window.active_since);
        assert_eq!(kind, RecurrenceKind::Once);
        assert_eq!(spec, RecurrenceSpec::Once);
    }

    #[test]
    fn test_validate_request_rejects_bad_dates() {
        let mut req = base_request();
        req.start_time = "24/08/25 10:00".to_string();
        assert!(validate_request(&req).unwrap_err().contains("invalid date format"));
    }

    #[test]
    fn test_validate_request_rejects_unknown_kind() {
        let mut req = base_request();
        req.recurrence_type = "hourly".to_string();
        assert!(validate_request(&req)
            .unwrap_err()
            .contains("recurrence type not supported"));
    }

    #[test]
    fn test_validate_request_routine_needs_config() {
        let mut req = base_request();
        req.recurrence_type = "weekly".to_string();
        assert!(validate_request(&req).unwrap_err().contains("configuration is missing"));

        req.recurrence_config = Some(RecurrenceConfig {
            dayofweek: Some(24),
            ..Default::default()
        });
        let (_, kind, spec) = validate_request(&req).unwrap();
        assert_eq!(kind, RecurrenceKind::Weekly);
        assert!(matches!(spec, RecurrenceSpec::Weekly { dayofweek: 24, .. }));
    }

    #[test]
    fn test_validate_request_reports_all_monthly_errors() {
        let mut req = base_request();
        req.recurrence_type = "monthly".to_string();
        req.recurrence_config = Some(RecurrenceConfig::default());
        let message = validate_request(&req).unwrap_err();
        assert!(message.contains("day or dayofweek"));
        assert!(message.contains("start_time"));
        assert!(message.contains("duration"));
    }

    #[test]
    fn test_preview_routine_weekly() {
        let config = RecurrenceConfig {
            start_time: Some(18000),
            duration: Some(7200),
            dayofweek: Some(24),
            ..Default::default()
        };
        match preview_routine("weekly", &config) {
            Response::Preview {
                valid,
                details,
                message,
            } => {
                assert!(valid);
                assert_eq!(message, "Valid weekly configuration");
                assert!(details[0].contains("Thursday, Friday"));
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_preview_routine_invalid_reports_errors() {
        let config = RecurrenceConfig {
            dayofweek: Some(200),
            ..Default::default()
        };
        match preview_routine("weekly", &config) {
            Response::Preview { valid, details, .. } => {
                assert!(!valid);
                assert!(details[0].contains("dayofweek"));
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_creation_summary_routine_details() {
        let mut targets = TargetSet::default();
        targets.add_hosts([TargetRef {
            id: "1".to_string(),
            name: "srv-web01".to_string(),
        }]);
        let descriptor = MaintenanceDescriptor::assemble(
            MaintenanceWindow {
                active_since: 100,
                active_till: 1_000_000,
            },
            RecurrenceSpec::Weekly {
                start_time: 18000,
                duration: 7200,
                dayofweek: 24,
                every: 1,
            },
            targets,
            "AI Routine Maintenance: 100-178306".to_string(),
            "Patch servers".to_string(),
            Some("100-178306".to_string()),
        )
        .unwrap();

        let summary = creation_summary(&descriptor, &base_request(), &[], &["db-group".to_string()]);
        assert!(summary.contains("- Type: Routine (weekly)"));
        assert!(summary.contains("Thursday, Friday"));
        assert!(summary.contains("- Ticket: 100-178306"));
        assert!(summary.contains("- Not found, groups: db-group"));
    }

    #[test]
    fn test_summarize_handles_string_encoded_fields() {
        let row = json!({
            "maintenanceid": "42",
            "name": "AI Maintenance: 100-178306",
            "description": "Patch servers",
            "active_since": "1756000000",
            "active_till": "1756007200",
            "timeperiods": [{"timeperiod_type": "3"}],
        });
        let summary = summarize(&row);
        assert_eq!(summary.maintenance_id, "42");
        assert_eq!(summary.routine_type, "weekly");
        assert_eq!(summary.ticket_number, "100-178306");
        assert!(!summary.active_since.is_empty());
    }

    #[test]
    fn test_summarize_defaults_to_once_without_timeperiods() {
        let row = json!({
            "maintenanceid": "7",
            "name": "Window",
            "description": "",
            "active_since": 1756000000i64,
            "active_till": 1756007200i64,
        });
        assert_eq!(summarize(&row).routine_type, "once");
    }
}
