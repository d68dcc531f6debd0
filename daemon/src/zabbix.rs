use crate::config::ZabbixConfig;
use crate::resolver::Inventory;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use common::{ExactMatch, MaintenancePayload, TargetRef, TriggerTag};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Client for the Zabbix 7.2 JSON-RPC API.
pub struct ZabbixClient {
    url: String,
    token: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct HostRow {
    hostid: String,
    host: String,
    #[serde(default)]
    name: String,
}

impl HostRow {
    /// Visible name when set, technical host name otherwise.
    fn into_target(self) -> TargetRef {
        TargetRef {
            id: self.hostid,
            name: if self.name.is_empty() {
                self.host
            } else {
                self.name
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GroupRow {
    groupid: String,
    name: String,
}

impl GroupRow {
    fn into_target(self) -> TargetRef {
        TargetRef {
            id: self.groupid,
            name: self.name,
        }
    }
}

impl ZabbixClient {
    pub fn new(config: &ZabbixConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            url: config.api_url.clone(),
            token: config.token.clone(),
            http,
        })
    }

    /// Base method for API calls. A Zabbix-level `error` object is passed
    /// through unmodified in the error message.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        log::info!("API call: {}", method);
        log::debug!("API params for {}: {}", method, payload["params"]);

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Connection error calling {}", method))?;

        log::debug!("Status for {}: {}", method, response.status());

        let body: Value = response
            .error_for_status()
            .with_context(|| format!("HTTP error calling {}", method))?
            .json()
            .await
            .context("Invalid response from server")?;

        if let Some(error) = body.get("error") {
            bail!("Zabbix API error in {}: {}", method, error);
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Test the API connection with a minimal user.get call.
    pub async fn ping(&self) -> Result<()> {
        self.call(
            "user.get",
            json!({"output": ["userid", "username"], "limit": 1}),
        )
        .await
        .map(|_| ())
    }

    /// Verify that a userid exists in Zabbix.
    pub async fn user_exists(&self, userid: &str) -> Result<bool> {
        let result = self
            .call(
                "user.get",
                json!({"userids": [userid], "output": ["userid", "username"]}),
            )
            .await?;
        Ok(result.as_array().map(|a| !a.is_empty()).unwrap_or(false))
    }

    /// Submit a maintenance and return the new maintenance id.
    pub async fn create_maintenance(&self, payload: &MaintenancePayload) -> Result<String> {
        let params = serde_json::to_value(payload)?;
        let result = self.call("maintenance.create", params).await?;
        result["maintenanceids"][0]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("maintenance.create returned no maintenance id"))
    }

    /// The 50 most recent maintenances with their timeperiods.
    pub async fn list_maintenances(&self) -> Result<Vec<Value>> {
        let result = self
            .call(
                "maintenance.get",
                json!({
                    "output": ["maintenanceid", "name", "active_since", "active_till",
                               "description", "maintenance_type"],
                    "selectHosts": ["hostid", "host", "name"],
                    "selectGroups": ["groupid", "name"],
                    "selectTags": ["tag", "value"],
                    "selectTimeperiods": ["timeperiod_type", "start_time", "period",
                                          "every", "dayofweek", "day", "month"],
                    "sortfield": "active_since",
                    "sortorder": "DESC",
                    "limit": 50,
                }),
            )
            .await?;
        serde_json::from_value(result).context("Unexpected maintenance.get result shape")
    }
}

#[async_trait]
impl Inventory for ZabbixClient {
    async fn exact_hosts(&self, names: &[String]) -> Result<Vec<ExactMatch>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let result = self
            .call(
                "host.get",
                json!({
                    "output": ["hostid", "host", "name", "status"],
                    "filter": {"host": names},
                }),
            )
            .await?;
        let rows: Vec<HostRow> = serde_json::from_value(result)?;
        log::info!("Hosts found: {}", rows.len());
        Ok(rows
            .into_iter()
            .map(|row| ExactMatch {
                matched_name: row.host.clone(),
                target: row.into_target(),
            })
            .collect())
    }

    async fn fuzzy_hosts(&self, term: &str, limit: usize) -> Result<Vec<TargetRef>> {
        let result = self
            .call(
                "host.get",
                json!({
                    "output": ["hostid", "host", "name", "status"],
                    "search": {"host": term, "name": term},
                    "searchWildcardsEnabled": true,
                    "limit": limit,
                }),
            )
            .await?;
        let rows: Vec<HostRow> = serde_json::from_value(result)?;
        Ok(rows.into_iter().map(HostRow::into_target).collect())
    }

    async fn exact_groups(&self, names: &[String]) -> Result<Vec<ExactMatch>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let result = self
            .call(
                "hostgroup.get",
                json!({
                    "output": ["groupid", "name"],
                    "filter": {"name": names},
                }),
            )
            .await?;
        let rows: Vec<GroupRow> = serde_json::from_value(result)?;
        Ok(rows
            .into_iter()
            .map(|row| ExactMatch {
                matched_name: row.name.clone(),
                target: row.into_target(),
            })
            .collect())
    }

    async fn fuzzy_groups(&self, term: &str, limit: usize) -> Result<Vec<TargetRef>> {
        let result = self
            .call(
                "hostgroup.get",
                json!({
                    "output": ["groupid", "name"],
                    "search": {"name": term},
                    "searchWildcardsEnabled": true,
                    "limit": limit,
                }),
            )
            .await?;
        let rows: Vec<GroupRow> = serde_json::from_value(result)?;
        Ok(rows.into_iter().map(GroupRow::into_target).collect())
    }

    async fn hosts_by_tags(&self, tags: &[TriggerTag]) -> Result<Vec<TargetRef>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let result = self
            .call(
                "host.get",
                json!({
                    "output": ["hostid", "host", "name", "status"],
                    // 0 = And/Or: AND across tag names, OR within a tag
                    "evaltype": 0,
                    "tags": tags,
                }),
            )
            .await?;
        let rows: Vec<HostRow> = serde_json::from_value(result)?;
        Ok(rows.into_iter().map(HostRow::into_target).collect())
    }
}
