use crate::config::ResolverConfig;
use anyhow::Result;
use async_trait::async_trait;
use common::{ExactMatch, ResolutionResult, TargetRef, TriggerTag};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};

/// Lookup operations the monitoring platform provides. Implementations
/// are selected once at startup and passed in explicitly; the resolver
/// never performs network I/O on its own.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn exact_hosts(&self, names: &[String]) -> Result<Vec<ExactMatch>>;
    async fn fuzzy_hosts(&self, term: &str, limit: usize) -> Result<Vec<TargetRef>>;
    async fn exact_groups(&self, names: &[String]) -> Result<Vec<ExactMatch>>;
    async fn fuzzy_groups(&self, term: &str, limit: usize) -> Result<Vec<TargetRef>>;
    async fn hosts_by_tags(&self, tags: &[TriggerTag]) -> Result<Vec<TargetRef>>;
}

#[derive(Debug, Clone, Copy)]
enum EntityKind {
    Host,
    Group,
}

impl EntityKind {
    fn label(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Group => "group",
        }
    }
}

/// Two-tier name resolution: one batched exact lookup, then a wildcard
/// fallback per unresolved name. Fuzzy lookups run concurrently under a
/// worker cap, each with its own timeout, and the whole batch honors a
/// single deadline. Lookup failures degrade to missing names instead of
/// aborting the batch.
pub struct Resolver {
    inventory: Arc<dyn Inventory>,
    fuzzy_limit: usize,
    max_concurrent: usize,
    lookup_timeout: Duration,
    batch_deadline: Duration,
}

impl Resolver {
    pub fn new(inventory: Arc<dyn Inventory>, config: &ResolverConfig) -> Self {
        Self {
            inventory,
            fuzzy_limit: config.fuzzy_limit,
            max_concurrent: config.max_concurrent_lookups.max(1),
            lookup_timeout: Duration::from_secs(config.lookup_timeout_secs),
            batch_deadline: Duration::from_secs(config.batch_deadline_secs),
        }
    }

    pub async fn resolve_hosts(&self, names: &[String]) -> ResolutionResult {
        self.resolve(EntityKind::Host, names).await
    }

    pub async fn resolve_groups(&self, names: &[String]) -> ResolutionResult {
        self.resolve(EntityKind::Group, names).await
    }

    /// Tag-filtered host lookup. Tags have no name to fail against, so a
    /// lookup failure just yields an empty contribution.
    pub async fn resolve_by_tags(&self, tags: &[TriggerTag]) -> Vec<TargetRef> {
        if tags.is_empty() {
            return Vec::new();
        }
        match self.inventory.hosts_by_tags(tags).await {
            Ok(found) => dedup_by_id(found),
            Err(e) => {
                log::error!("Tag lookup failed: {:#}", e);
                Vec::new()
            }
        }
    }

    async fn resolve(&self, kind: EntityKind, names: &[String]) -> ResolutionResult {
        let mut result = ResolutionResult::default();
        if names.is_empty() {
            return result;
        }

        let exact = match kind {
            EntityKind::Host => self.inventory.exact_hosts(names).await,
            EntityKind::Group => self.inventory.exact_groups(names).await,
        };

        // A failed batch lookup degrades to fuzzy fallback for every
        // name; partial resolution beats total failure.
        let remaining: Vec<String> = match exact {
            Ok(matches) => {
                let matched: HashSet<String> =
                    matches.iter().map(|m| m.matched_name.clone()).collect();
                result.found.extend(matches.into_iter().map(|m| m.target));
                names
                    .iter()
                    .filter(|n| !matched.contains(*n))
                    .cloned()
                    .collect()
            }
            Err(e) => {
                log::warn!(
                    "Exact {} lookup failed, falling back to fuzzy search for all {} names: {:#}",
                    kind.label(),
                    names.len(),
                    e
                );
                names.to_vec()
            }
        };

        if !remaining.is_empty() {
            self.fuzzy_fallback(kind, remaining, &mut result).await;
        }

        result.found = dedup_by_id(std::mem::take(&mut result.found));
        result
    }

    async fn fuzzy_fallback(
        &self,
        kind: EntityKind,
        remaining: Vec<String>,
        result: &mut ResolutionResult,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut pending: HashSet<String> = remaining.iter().cloned().collect();
        let mut tasks: JoinSet<(String, Option<Vec<TargetRef>>)> = JoinSet::new();

        for name in remaining {
            let inventory = self.inventory.clone();
            let semaphore = semaphore.clone();
            let limit = self.fuzzy_limit;
            let lookup_timeout = self.lookup_timeout;
            tasks.spawn(async move {
                // Closing the semaphore is not part of this design, so
                // acquire can only fail if the task set was aborted.
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (name, None);
                };
                let lookup = async {
                    match kind {
                        EntityKind::Host => inventory.fuzzy_hosts(&name, limit).await,
                        EntityKind::Group => inventory.fuzzy_groups(&name, limit).await,
                    }
                };
                match timeout(lookup_timeout, lookup).await {
                    Ok(Ok(matches)) => (name, Some(matches)),
                    Ok(Err(e)) => {
                        log::warn!("Fuzzy {} lookup for {:?} failed: {:#}", kind.label(), name, e);
                        (name, None)
                    }
                    Err(_) => {
                        log::warn!("Fuzzy {} lookup for {:?} timed out", kind.label(), name);
                        (name, None)
                    }
                }
            });
        }

        let deadline = Instant::now() + self.batch_deadline;
        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((name, outcome)))) => {
                    pending.remove(&name);
                    match outcome {
                        Some(matches) if !matches.is_empty() => result.found.extend(matches),
                        // Zero matches and transport failures both leave
                        // only this one name unresolved.
                        _ => result.missing.push(name),
                    }
                }
                Ok(Some(Err(e))) => {
                    log::error!("Fuzzy lookup task panicked: {}", e);
                }
                Ok(None) => break,
                Err(_) => {
                    log::warn!(
                        "Resolution deadline expired with {} {} name(s) still pending",
                        pending.len(),
                        kind.label()
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        // Whatever never finished before the deadline is missing too.
        let mut leftover: Vec<String> = pending.into_iter().collect();
        leftover.sort();
        result.missing.extend(leftover);
    }
}

/// Collapse entries sharing an id, keeping the first-encountered name.
fn dedup_by_id(targets: Vec<TargetRef>) -> Vec<TargetRef> {
    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter(|t| seen.insert(t.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::TargetSet;
    use std::collections::HashMap;

    fn target(id: &str, name: &str) -> TargetRef {
        TargetRef {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    /// In-memory inventory with switchable failure and delay modes.
    #[derive(Default)]
    struct MockInventory {
        exact_hosts: HashMap<String, TargetRef>,
        fuzzy_hosts: HashMap<String, Vec<TargetRef>>,
        exact_groups: HashMap<String, TargetRef>,
        fuzzy_groups: HashMap<String, Vec<TargetRef>>,
        tag_hosts: Vec<TargetRef>,
        fail_exact: bool,
        fail_fuzzy_for: HashSet<String>,
        slow_fuzzy_for: HashSet<String>,
    }

    #[async_trait]
    impl Inventory for MockInventory {
        async fn exact_hosts(&self, names: &[String]) -> Result<Vec<ExactMatch>> {
            if self.fail_exact {
                anyhow::bail!("connection refused");
            }
            Ok(names
                .iter()
                .filter_map(|n| {
                    self.exact_hosts.get(n).map(|t| ExactMatch {
                        matched_name: n.clone(),
                        target: t.clone(),
                    })
                })
                .collect())
        }

        async fn fuzzy_hosts(&self, term: &str, _limit: usize) -> Result<Vec<TargetRef>> {
            if self.slow_fuzzy_for.contains(term) {
                // Far beyond any configured timeout; the paused test
                // clock auto-advances past whichever timer fires first.
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail_fuzzy_for.contains(term) {
                anyhow::bail!("connection reset");
            }
            Ok(self.fuzzy_hosts.get(term).cloned().unwrap_or_default())
        }

        async fn exact_groups(&self, names: &[String]) -> Result<Vec<ExactMatch>> {
            if self.fail_exact {
                anyhow::bail!("connection refused");
            }
            Ok(names
                .iter()
                .filter_map(|n| {
                    self.exact_groups.get(n).map(|t| ExactMatch {
                        matched_name: n.clone(),
                        target: t.clone(),
                    })
                })
                .collect())
        }

        async fn fuzzy_groups(&self, term: &str, _limit: usize) -> Result<Vec<TargetRef>> {
            if self.fail_fuzzy_for.contains(term) {
                anyhow::bail!("connection reset");
            }
            Ok(self.fuzzy_groups.get(term).cloned().unwrap_or_default())
        }

        async fn hosts_by_tags(&self, _tags: &[TriggerTag]) -> Result<Vec<TargetRef>> {
            Ok(self.tag_hosts.clone())
        }
    }

    fn resolver(mock: MockInventory) -> Resolver {
        Resolver::new(Arc::new(mock), &ResolverConfig::default())
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_exact_then_fuzzy_merge() {
        let mut mock = MockInventory::default();
        mock.exact_hosts
            .insert("srv-a".to_string(), target("1", "srv-a"));
        mock.fuzzy_hosts
            .insert("srv-b".to_string(), vec![target("2", "srv-b.example.com")]);

        let result = resolver(mock).resolve_hosts(&names(&["srv-a", "srv-b"])).await;

        assert_eq!(result.found.len(), 2);
        assert!(result.missing.is_empty());
        assert!(!result.has_missing());
    }

    #[tokio::test]
    async fn test_zero_fuzzy_matches_records_missing() {
        let mut mock = MockInventory::default();
        mock.exact_hosts
            .insert("srv-a".to_string(), target("1", "srv-a"));

        let result = resolver(mock)
            .resolve_hosts(&names(&["srv-a", "no-such-host"]))
            .await;

        assert_eq!(result.found.len(), 1);
        assert_eq!(result.missing, vec!["no-such-host".to_string()]);
    }

    #[tokio::test]
    async fn test_exact_failure_degrades_to_fuzzy_for_all() {
        let mut mock = MockInventory::default();
        mock.fail_exact = true;
        mock.fuzzy_hosts
            .insert("srv-a".to_string(), vec![target("1", "srv-a")]);
        mock.fuzzy_hosts
            .insert("srv-b".to_string(), vec![target("2", "srv-b")]);

        let result = resolver(mock).resolve_hosts(&names(&["srv-a", "srv-b"])).await;

        assert_eq!(result.found.len(), 2);
        assert!(result.missing.is_empty());
    }

    #[tokio::test]
    async fn test_fuzzy_failure_isolated_to_one_name() {
        let mut mock = MockInventory::default();
        mock.fuzzy_hosts
            .insert("srv-a".to_string(), vec![target("1", "srv-a")]);
        mock.fail_fuzzy_for.insert("srv-b".to_string());

        let result = resolver(mock).resolve_hosts(&names(&["srv-a", "srv-b"])).await;

        assert_eq!(result.found.len(), 1);
        assert_eq!(result.missing, vec!["srv-b".to_string()]);
    }

    #[tokio::test]
    async fn test_fuzzy_results_dedup_by_id() {
        // Two different search terms hit the same host.
        let mut mock = MockInventory::default();
        mock.fuzzy_hosts
            .insert("web".to_string(), vec![target("1", "srv-web01")]);
        mock.fuzzy_hosts
            .insert("web01".to_string(), vec![target("1", "srv-web01")]);

        let result = resolver(mock).resolve_hosts(&names(&["web", "web01"])).await;

        assert_eq!(result.found.len(), 1);
        assert!(result.missing.is_empty());
    }

    #[tokio::test]
    async fn test_exact_and_tag_sources_collapse_in_target_set() {
        let mut mock = MockInventory::default();
        mock.exact_hosts
            .insert("srv-a".to_string(), target("1", "srv-a"));
        mock.tag_hosts = vec![target("1", "srv-a"), target("3", "srv-c")];

        let resolver = resolver(mock);
        let by_name = resolver.resolve_hosts(&names(&["srv-a"])).await;
        let by_tags = resolver
            .resolve_by_tags(&[TriggerTag {
                tag: "component".to_string(),
                value: "cpu".to_string(),
            }])
            .await;

        let mut targets = TargetSet::default();
        targets.add_hosts(by_name.found);
        targets.add_hosts(by_tags);

        assert_eq!(targets.hosts.len(), 2);
        assert_eq!(targets.hosts[0].id, "1");
    }

    #[tokio::test]
    async fn test_groups_resolve_symmetrically() {
        let mut mock = MockInventory::default();
        mock.exact_groups
            .insert("Linux servers".to_string(), target("2", "Linux servers"));
        mock.fuzzy_groups
            .insert("web".to_string(), vec![target("5", "Web servers")]);

        let result = resolver(mock)
            .resolve_groups(&names(&["Linux servers", "web", "nope"]))
            .await;

        assert_eq!(result.found.len(), 2);
        assert_eq!(result.missing, vec!["nope".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_timeout_leaves_siblings_unaffected() {
        // Default config: 10s per lookup. The slow lookup times out and
        // only its name goes missing; the fast sibling still resolves.
        let mut mock = MockInventory::default();
        mock.fuzzy_hosts
            .insert("fast".to_string(), vec![target("1", "srv-fast")]);
        mock.slow_fuzzy_for.insert("slow".to_string());

        let result = resolver(mock).resolve_hosts(&names(&["fast", "slow"])).await;

        assert_eq!(result.found, vec![target("1", "srv-fast")]);
        assert_eq!(result.missing, vec!["slow".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_deadline_maps_pending_names_to_missing() {
        // Per-lookup timeout longer than the batch deadline, so the
        // deadline is what fires; both stuck names come back missing.
        let mut mock = MockInventory::default();
        mock.fuzzy_hosts
            .insert("fast".to_string(), vec![target("1", "srv-fast")]);
        mock.slow_fuzzy_for.insert("slow-b".to_string());
        mock.slow_fuzzy_for.insert("slow-a".to_string());

        let config = ResolverConfig {
            lookup_timeout_secs: 7200,
            batch_deadline_secs: 30,
            ..Default::default()
        };
        let result = Resolver::new(Arc::new(mock), &config)
            .resolve_hosts(&names(&["fast", "slow-b", "slow-a"]))
            .await;

        assert_eq!(result.found.len(), 1);
        assert_eq!(
            result.missing,
            vec!["slow-a".to_string(), "slow-b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_input_is_a_no_op() {
        let result = resolver(MockInventory::default()).resolve_hosts(&[]).await;
        assert!(result.found.is_empty());
        assert!(result.missing.is_empty());
        assert!(resolver(MockInventory::default()).resolve_by_tags(&[]).await.is_empty());
    }
}
