use serde::{Deserialize, Serialize};

/// A host or group in the Zabbix inventory. Identity is `id`; `name` is
/// the visible name and is informational only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetRef {
    pub id: String,
    pub name: String,
}

/// One row from a batched exact lookup. `matched_name` is the input name
/// the row matched on (the technical host name for hosts), which is what
/// the resolver partitions against before falling back to fuzzy search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactMatch {
    pub matched_name: String,
    pub target: TargetRef,
}

/// A trigger tag filter, e.g. `{tag: "component", value: "cpu"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerTag {
    pub tag: String,
    pub value: String,
}

/// Resolved targets for one maintenance, deduplicated by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetSet {
    pub hosts: Vec<TargetRef>,
    pub groups: Vec<TargetRef>,
    pub trigger_tags: Vec<TriggerTag>,
}

impl TargetSet {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.groups.is_empty()
    }

    /// Append hosts, collapsing entries that share an id. The first-seen
    /// name is kept.
    pub fn add_hosts(&mut self, hosts: impl IntoIterator<Item = TargetRef>) {
        for host in hosts {
            if !self.hosts.iter().any(|h| h.id == host.id) {
                self.hosts.push(host);
            }
        }
    }

    pub fn add_groups(&mut self, groups: impl IntoIterator<Item = TargetRef>) {
        for group in groups {
            if !self.groups.iter().any(|g| g.id == group.id) {
                self.groups.push(group);
            }
        }
    }

    pub fn host_names(&self) -> Vec<String> {
        self.hosts.iter().map(|h| h.name.clone()).collect()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.name.clone()).collect()
    }
}

/// Outcome of resolving a list of names: what was found plus the input
/// names that resolved to nothing. Unresolved names are data, not errors;
/// a partial resolution is still useful to the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub found: Vec<TargetRef>,
    pub missing: Vec<String>,
}

impl ResolutionResult {
    pub fn has_missing(&self) -> bool {
        !self.missing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str, name: &str) -> TargetRef {
        TargetRef {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_dedup_keeps_first_seen_name() {
        let mut set = TargetSet::default();
        set.add_hosts([target("10084", "srv-web01"), target("10085", "srv-web02")]);
        set.add_hosts([target("10084", "srv-web01.example.com")]);

        assert_eq!(set.hosts.len(), 2);
        assert_eq!(set.hosts[0].name, "srv-web01");
    }

    #[test]
    fn test_empty_target_set() {
        let mut set = TargetSet::default();
        assert!(set.is_empty());
        set.add_groups([target("2", "Linux servers")]);
        assert!(!set.is_empty());
    }
}
