//! Capability Registry (spec §4.6): discovery, matching, acquisition,
//! and variety-gap accounting. Shared read, single-writer — the
//! registry itself serializes writes (spec §3), so this type takes
//! `&mut self` for every mutating operation and callers own the single
//! mailbox that enforces serialization (as `vsm-runtime`'s actors do).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use vsm_runtime::CapabilityHandler;

use crate::error::{CapabilityError, Result};
use crate::mcp::{McpClient, McpTool, ServerAdapter};
use crate::types::{
    Capability, CapabilityKind, CapabilitySource, MatchReport, Priority, Requirement, ScoredMatch, VarietyGap,
};

pub struct CapabilityRegistry {
    capabilities: HashMap<String, Capability>,
    registration_order: Vec<String>,
    servers: HashMap<String, Arc<dyn McpClient>>,
    discovery_deadline: Duration,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
            registration_order: Vec::new(),
            servers: HashMap::new(),
            discovery_deadline: Duration::from_secs(60),
        }
    }

    pub fn register_server(&mut self, name: impl Into<String>, client: Arc<dyn McpClient>) {
        self.servers.insert(name.into(), client);
    }

    /// `register_capability(def) -> id`. Name collisions across the
    /// same `(kind, source-category)` are rejected (spec §3). Calling
    /// this twice with the same id leaves the registry in the state a
    /// single call would (spec §8 idempotence law): the first call wins,
    /// the second errors without mutating anything.
    pub fn register_capability(&mut self, def: Capability) -> Result<String> {
        if self.capabilities.contains_key(&def.id) {
            return Err(CapabilityError::AlreadyExists(def.id.clone()));
        }
        let collision = self.capabilities.values().any(|c| {
            c.name == def.name && c.kind == def.kind && c.source.category() == def.source.category()
        });
        if collision {
            return Err(CapabilityError::AlreadyExists(def.name.clone()));
        }
        let id = def.id.clone();
        self.registration_order.push(id.clone());
        self.capabilities.insert(id.clone(), def);
        debug!(capability_id = %id, "capability registered");
        Ok(id)
    }

    pub fn unregister_capability(&mut self, id: &str) -> Result<()> {
        self.capabilities
            .remove(id)
            .ok_or_else(|| CapabilityError::NotFound(id.to_string()))?;
        self.registration_order.retain(|i| i != id);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Capability> {
        self.capabilities
            .get(id)
            .ok_or_else(|| CapabilityError::NotFound(id.to_string()))
    }

    pub fn list_capabilities(&self, kind: Option<CapabilityKind>) -> Vec<Capability> {
        self.registration_order
            .iter()
            .filter_map(|id| self.capabilities.get(id))
            .filter(|c| kind.map(|k| c.kind == k).unwrap_or(true))
            .cloned()
            .collect()
    }

    /// `discover_capabilities(req) -> ranked matches`: searches locally
    /// first, then queries every registered external server's tool
    /// list, each bounded by the discovery deadline so one slow server
    /// can't block the others (spec §5: "a hard upper bound; expiry
    /// returns partial results"). Scoring per spec §4.6; ties broken by
    /// earliest local registration, external hits sorting after any
    /// equal-scored local ones.
    pub async fn discover_capabilities(&self, req: &Requirement) -> Vec<ScoredMatch> {
        let mut scored: Vec<(u32, usize, String)> = Vec::new();

        for (order, id) in self.registration_order.iter().enumerate() {
            let Some(cap) = self.capabilities.get(id) else { continue };
            if cap.kind != req.kind {
                continue;
            }
            let score = 100 + req.priority.score_adder() + if cap.source.is_local() { 20 } else { 0 };
            scored.push((score, order, id.clone()));
        }

        for (server_name, client) in &self.servers {
            let tools = match tokio::time::timeout(self.discovery_deadline, client.list_tools()).await {
                Ok(Ok(tools)) => tools,
                Ok(Err(err)) => {
                    debug!(server = %server_name, cause = %err, "discovery query failed, skipping");
                    continue;
                }
                Err(_) => {
                    debug!(server = %server_name, "discovery query timed out, returning partial results");
                    continue;
                }
            };
            for tool in tools {
                let overlap = keyword_overlap(&req.keywords, &tool);
                if overlap == 0 {
                    continue;
                }
                let score = overlap * 25 + req.priority.score_adder();
                scored.push((score, usize::MAX, format!("external:{server_name}:{}", tool.name)));
            }
        }

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored
            .into_iter()
            .map(|(score, _, capability_id)| ScoredMatch { capability_id, score })
            .collect()
    }

    /// `match_capabilities([req]) -> {matches, gaps, coverage%}`.
    pub async fn match_capabilities(&self, reqs: &[Requirement]) -> MatchReport {
        let mut matches = Vec::new();
        let mut gaps = Vec::new();
        for req in reqs {
            let discovered = self.discover_capabilities(req).await;
            match discovered.into_iter().next() {
                Some(top) if top.score >= req.priority.match_threshold() => matches.push(top),
                _ => gaps.push(req.id.clone()),
            }
        }
        let coverage_pct = if reqs.is_empty() {
            100.0
        } else {
            matches.len() as f64 / reqs.len() as f64 * 100.0
        };
        MatchReport {
            matches,
            gaps,
            coverage_pct,
        }
    }

    /// `acquire_capability(id)`: for an external capability, connect to
    /// its server, build a local adapter, and register the adapter as a
    /// new local capability S1 can execute. Returns the new capability
    /// and the handler to hand to S1's `register_capability`.
    pub async fn acquire_capability(
        &mut self,
        id: &str,
        tool_name: impl Into<String>,
        schema: serde_json::Value,
    ) -> Result<(Capability, Arc<dyn CapabilityHandler>)> {
        let source_cap = self.get(id)?.clone();
        let server_name = match &source_cap.source {
            CapabilitySource::External { server } => server.clone(),
            _ => return Err(CapabilityError::InvalidOperation("capability is not external".to_string())),
        };
        let client = self
            .servers
            .get(&server_name)
            .cloned()
            .ok_or_else(|| CapabilityError::ServerUnavailable {
                name: server_name.clone(),
            })?;
        client.initialize().await?;

        let tool_name = tool_name.into();
        let adapter = Arc::new(ServerAdapter::new(server_name.clone(), tool_name.clone(), schema.clone(), client));

        let adapted = Capability {
            id: format!("adapted:{id}"),
            name: source_cap.name.clone(),
            kind: source_cap.kind,
            source: CapabilitySource::Adapted { server: server_name },
            schema,
            metadata: source_cap.metadata.clone(),
        };
        self.register_capability(adapted.clone())?;
        Ok((adapted, adapter as Arc<dyn CapabilityHandler>))
    }

    /// `calculate_variety_gap()`: a coarse Ashby-style accounting over
    /// registered capability kinds. `available` counts distinct kinds
    /// this registry can currently serve; `required` is supplied by the
    /// caller (the Variety/Gap Controller owns the environmental-demand
    /// estimate — spec §4.7).
    pub fn calculate_variety_gap(&self, required: usize) -> VarietyGap {
        let current = self.capabilities.len();
        let available = self
            .capabilities
            .values()
            .map(|c| c.kind)
            .collect::<std::collections::HashSet<_>>()
            .len();
        let gap = required as i64 - available as i64;
        let mut recommendations = Vec::new();
        if gap > 0 {
            recommendations.push(format!("acquire {gap} additional capability kind(s)"));
        }
        VarietyGap {
            current,
            available,
            required,
            gap,
            potential: self.servers.len(),
            recommendations,
        }
    }
}

fn keyword_overlap(keywords: &[String], tool: &McpTool) -> u32 {
    let haystack = format!("{} {}", tool.name, tool.description).to_lowercase();
    keywords
        .iter()
        .filter(|kw| haystack.contains(&kw.to_lowercase()))
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::MockMcpClient;

    fn local_cap(name: &str, kind: CapabilityKind) -> Capability {
        Capability {
            id: format!("local:{name}"),
            name: name.to_string(),
            kind,
            source: CapabilitySource::Local,
            schema: serde_json::json!({}),
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn register_rejects_name_collision_in_same_kind_and_source_category() {
        let mut registry = CapabilityRegistry::new();
        registry.register_capability(local_cap("echo", CapabilityKind::Operational)).unwrap();
        let err = registry
            .register_capability(Capability {
                id: "local:echo2".into(),
                ..local_cap("echo", CapabilityKind::Operational)
            })
            .unwrap_err();
        assert_eq!(err.kind(), "already_exists");
    }

    #[test]
    fn register_same_id_twice_leaves_state_unchanged() {
        let mut registry = CapabilityRegistry::new();
        let cap = local_cap("echo", CapabilityKind::Operational);
        registry.register_capability(cap.clone()).unwrap();
        let before = registry.list_capabilities(None).len();
        let _ = registry.register_capability(cap);
        assert_eq!(registry.list_capabilities(None).len(), before);
    }

    // Scenario S-6 from the spec.
    #[tokio::test]
    async fn scenario_s6_discovery_scoring() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_capability(local_cap("data_processing", CapabilityKind::Operational))
            .unwrap();
        let mock: Arc<dyn McpClient> = Arc::new(MockMcpClient::new(vec![McpTool {
            name: "csv_data_processing_v2".into(),
            description: "processes csv data files".into(),
            input_schema: serde_json::json!({}),
        }]));
        registry.register_server("ext-1", mock);

        let req = Requirement {
            id: "r1".into(),
            kind: CapabilityKind::Operational,
            constraints: serde_json::json!({}),
            priority: Priority::High,
            keywords: vec!["data_processing".into()],
        };
        let ranked = registry.discover_capabilities(&req).await;
        assert_eq!(ranked[0].capability_id, "local:data_processing");
        assert_eq!(ranked[0].score, 150);
        assert!(ranked[1].score < ranked[0].score);
    }

    #[tokio::test]
    async fn match_capabilities_reports_gaps_below_threshold() {
        let registry = CapabilityRegistry::new();
        let req = Requirement {
            id: "r1".into(),
            kind: CapabilityKind::Operational,
            constraints: serde_json::json!({}),
            priority: Priority::Critical,
            keywords: vec![],
        };
        let report = registry.match_capabilities(&[req]).await;
        assert_eq!(report.gaps, vec!["r1".to_string()]);
        assert_eq!(report.coverage_pct, 0.0);
    }

    #[tokio::test]
    async fn acquire_capability_registers_local_adapter() {
        let mut registry = CapabilityRegistry::new();
        let mock: Arc<dyn McpClient> = Arc::new(MockMcpClient::new(vec![McpTool {
            name: "csv_tool".into(),
            description: "".into(),
            input_schema: serde_json::json!({}),
        }]));
        registry.register_server("ext-1", mock);
        let external = Capability {
            id: "ext:csv".into(),
            name: "csv_tool".into(),
            kind: CapabilityKind::Operational,
            source: CapabilitySource::External { server: "ext-1".into() },
            schema: serde_json::json!({}),
            metadata: serde_json::json!({}),
        };
        registry.register_capability(external).unwrap();

        let (adapted, handler) = registry
            .acquire_capability("ext:csv", "csv_tool", serde_json::json!({}))
            .await
            .unwrap();
        assert!(matches!(adapted.source, CapabilitySource::Adapted { .. }));
        let result = handler.invoke(serde_json::json!({})).await.unwrap();
        assert_eq!(result["tool"], "csv_tool");
        assert!(registry.get(&adapted.id).is_ok());
    }
}
