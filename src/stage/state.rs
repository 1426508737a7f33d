// ABOUTME: State threaded through the stages of one run.
// ABOUTME: Provisioning outputs, the published image, completed stages, and opened tunnels.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::id::StageId;
use crate::tunnel::{Tunnel, TunnelRecord};
use crate::types::ImageRef;

/// Named values produced by infrastructure provisioning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisioningOutputs {
    values: BTreeMap<String, String>,
}

impl ProvisioningOutputs {
    /// Parse `terraform output -json`.
    ///
    /// Each top-level key maps to an object with a `value` field. String
    /// values are taken as-is; other values keep their JSON rendering.
    pub fn from_terraform_json(json: &str) -> Result<Self, String> {
        let parsed: serde_json::Value =
            serde_json::from_str(json).map_err(|e| format!("invalid JSON: {}", e))?;
        let object = parsed
            .as_object()
            .ok_or_else(|| "expected a JSON object of outputs".to_string())?;

        let mut values = BTreeMap::new();
        for (name, entry) in object {
            let value = entry
                .get("value")
                .ok_or_else(|| format!("output '{}' has no value", name))?;
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            values.insert(name.clone(), rendered);
        }
        Ok(Self { values })
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, String)> for ProvisioningOutputs {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Data later stages read from earlier ones.
#[derive(Debug, Default)]
pub struct PipelineState {
    pub outputs: Option<ProvisioningOutputs>,
    /// Image reference the release should deploy.
    pub image: Option<ImageRef>,
    pub release_revision: Option<u32>,
    completed: Vec<StageId>,
    tunnels: Vec<Arc<Tunnel>>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_completed(&mut self, stage: StageId) {
        if !self.completed.contains(&stage) {
            self.completed.push(stage);
        }
    }

    pub fn has_completed(&self, stage: StageId) -> bool {
        self.completed.contains(&stage)
    }

    pub fn completed(&self) -> &[StageId] {
        &self.completed
    }

    pub fn track_tunnel(&mut self, tunnel: Arc<Tunnel>) {
        self.tunnels.push(tunnel);
    }

    pub fn tunnel_records(&self) -> Vec<TunnelRecord> {
        self.tunnels.iter().map(|t| t.record()).collect()
    }

    /// Provisioning output `name`, if provisioning ran and produced it.
    pub fn output(&self, name: &str) -> Option<&str> {
        self.outputs.as_ref().and_then(|o| o.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_terraform_output_json() {
        let json = r#"{
            "cluster_name": {"sensitive": false, "type": "string", "value": "demo-eks"},
            "region": {"sensitive": false, "type": "string", "value": "eu-west-1"},
            "node_count": {"sensitive": false, "type": "number", "value": 3}
        }"#;
        let outputs = ProvisioningOutputs::from_terraform_json(json).unwrap();
        assert_eq!(outputs.get("cluster_name"), Some("demo-eks"));
        assert_eq!(outputs.get("region"), Some("eu-west-1"));
        assert_eq!(outputs.get("node_count"), Some("3"));
        assert_eq!(outputs.len(), 3);
    }

    #[test]
    fn empty_output_object_is_valid() {
        let outputs = ProvisioningOutputs::from_terraform_json("{}").unwrap();
        assert!(outputs.is_empty());
    }

    #[test]
    fn rejects_non_object_output() {
        assert!(ProvisioningOutputs::from_terraform_json("[]").is_err());
        assert!(ProvisioningOutputs::from_terraform_json("not json").is_err());
        assert!(ProvisioningOutputs::from_terraform_json(r#"{"a": {}}"#).is_err());
    }

    #[test]
    fn completion_is_recorded_once() {
        let mut state = PipelineState::new();
        state.mark_completed(StageId::ApplicationRelease);
        state.mark_completed(StageId::ApplicationRelease);
        assert_eq!(state.completed(), &[StageId::ApplicationRelease]);
        assert!(!state.has_completed(StageId::DeploymentVerify));
    }
}
