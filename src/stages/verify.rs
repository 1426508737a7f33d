// ABOUTME: deployment-verify: pods, release history, health, metrics, and smoke checks.
// ABOUTME: Probes go through port-forward tunnels closed by stage cleanup.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::tool;
use crate::config::Config;
use crate::invoke::Invocation;
use crate::readiness::{HttpProbe, ReadinessCheck, http_get};
use crate::stage::{Stage, StageAction, StageContext, StageError, StageId};
use crate::tunnel::TunnelSpec;

const LOCALHOST: &str = "127.0.0.1";

pub(super) fn stage(config: &Config) -> Stage {
    let kubectl = &config.tools.kubectl;
    let namespace = &config.namespace;

    Stage::new(StageId::DeploymentVerify)
        .invoke(tool(config, kubectl).args([
            "get".to_string(),
            "pods".to_string(),
            "-n".to_string(),
            namespace.clone(),
            "-l".to_string(),
            config.release_selector(),
        ]))
        .action(CheckHistory {
            invocation: tool(config, &config.tools.helm).args([
                "history".to_string(),
                config.project.to_string(),
                "-n".to_string(),
                namespace.clone(),
                "-o".to_string(),
                "json".to_string(),
                format!("--max={}", config.release.history_max),
            ]),
        })
        .action(ProbeApplication::from_config(config))
        .action(ProbePrometheus::from_config(config))
}

/// One row of `helm history -o json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryEntry {
    pub revision: u32,
    pub status: String,
    #[serde(default)]
    pub chart: String,
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub description: String,
}

pub fn parse_history(json: &str) -> Result<Vec<HistoryEntry>, String> {
    serde_json::from_str(json).map_err(|e| format!("invalid release history: {}", e))
}

/// The entry with the highest revision.
pub fn latest_revision(history: &[HistoryEntry]) -> Option<&HistoryEntry> {
    history.iter().max_by_key(|entry| entry.revision)
}

struct CheckHistory {
    invocation: Invocation,
}

#[async_trait]
impl StageAction for CheckHistory {
    fn describe(&self) -> String {
        self.invocation.to_string()
    }

    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<(), StageError> {
        let result = ctx.invoke(&self.invocation).await?;
        let unexpected = |reason: String| StageError::UnexpectedOutput {
            program: self.invocation.program.clone(),
            reason,
        };

        let history = parse_history(&result.stdout).map_err(unexpected)?;
        let latest = latest_revision(&history)
            .ok_or_else(|| unexpected("release has no revisions".to_string()))?;
        if latest.status != "deployed" {
            return Err(unexpected(format!(
                "revision {} is {}, expected deployed",
                latest.revision, latest.status
            )));
        }

        tracing::info!("Release revision {} is deployed", latest.revision);
        ctx.state.release_revision = Some(latest.revision);
        Ok(())
    }
}

/// Health, metrics, and smoke checks through a tunnel to the application.
struct ProbeApplication {
    tunnel: TunnelSpec,
    health_path: String,
    health_token: Option<String>,
    metrics_path: Option<String>,
    endpoints: Vec<String>,
    check: ReadinessCheck,
    request_timeout: Duration,
}

impl ProbeApplication {
    fn from_config(config: &Config) -> Self {
        let verify = &config.verify;
        Self {
            tunnel: TunnelSpec::port_forward(
                &config.tools.kubectl,
                &config.namespace,
                config.verify_service(),
                verify.local_port,
                verify.remote_port,
            )
            .settle(verify.settle),
            health_path: verify.health_path.clone(),
            health_token: verify.health_token.clone(),
            metrics_path: verify.metrics_path.clone(),
            endpoints: verify.endpoints.clone(),
            check: ReadinessCheck::new(verify.poll_interval, verify.deadline),
            request_timeout: verify.request_timeout,
        }
    }
}

#[async_trait]
impl StageAction for ProbeApplication {
    fn describe(&self) -> String {
        format!("probe {} through a tunnel", self.tunnel.target)
    }

    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<(), StageError> {
        let tunnel = ctx.open_tunnel(self.tunnel.clone()).await?;
        let port = tunnel.local_port();

        let mut health = HttpProbe::new(LOCALHOST, port, self.health_path.as_str())
            .attempt_timeout(self.request_timeout);
        if let Some(token) = &self.health_token {
            health = health.expect_body(token.as_str());
        }
        ctx.wait_for(&health, self.check).await?;

        if let Some(path) = &self.metrics_path {
            let response = http_get(LOCALHOST, port, path, self.request_timeout)
                .await
                .map_err(|reason| smoke(path, reason))?;
            if !response.is_success() {
                return Err(smoke(path, format!("HTTP {}", response.status)));
            }
            let samples = parse_exposition(&response.body).map_err(|reason| smoke(path, reason))?;
            if samples.is_empty() {
                return Err(smoke(path, "no metric samples exposed".to_string()));
            }
            tracing::debug!("{} exposes {} sample(s)", path, samples.len());
        }

        for endpoint in &self.endpoints {
            let response = http_get(LOCALHOST, port, endpoint, self.request_timeout)
                .await
                .map_err(|reason| smoke(endpoint, reason))?;
            if !response.is_success() {
                return Err(smoke(endpoint, format!("HTTP {}", response.status)));
            }
            tracing::debug!("{} answered {}", endpoint, response.status);
        }
        Ok(())
    }
}

fn smoke(endpoint: &str, reason: String) -> StageError {
    StageError::SmokeCheck {
        endpoint: endpoint.to_string(),
        reason,
    }
}

/// Waits for Prometheus readiness when the monitoring stack was deployed in this run.
struct ProbePrometheus {
    tunnel: TunnelSpec,
    check: ReadinessCheck,
    request_timeout: Duration,
}

impl ProbePrometheus {
    fn from_config(config: &Config) -> Self {
        let monitoring = &config.monitoring;
        Self {
            tunnel: TunnelSpec::port_forward(
                &config.tools.kubectl,
                &monitoring.namespace,
                &monitoring.prometheus_service,
                monitoring.local_port,
                monitoring.prometheus_port,
            )
            .settle(config.verify.settle),
            check: ReadinessCheck::new(config.verify.poll_interval, config.verify.deadline),
            request_timeout: config.verify.request_timeout,
        }
    }
}

#[async_trait]
impl StageAction for ProbePrometheus {
    fn describe(&self) -> String {
        format!("probe {}", self.tunnel.target)
    }

    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<(), StageError> {
        if !ctx.state.has_completed(StageId::MonitoringStackDeploy) {
            tracing::debug!("monitoring stack not deployed in this run, skipping Prometheus probe");
            return Ok(());
        }
        let tunnel = ctx.open_tunnel(self.tunnel.clone()).await?;
        let probe = HttpProbe::new(LOCALHOST, tunnel.local_port(), "/-/ready")
            .attempt_timeout(self.request_timeout);
        ctx.wait_for(&probe, self.check).await
    }
}

/// One sample line of the text exposition format.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
}

/// Parse Prometheus text exposition, rejecting malformed sample lines.
///
/// Comment lines (`# HELP`, `# TYPE`, anything else after `#`) and blank
/// lines are skipped. Errors name the 1-based line number.
pub fn parse_exposition(body: &str) -> Result<Vec<MetricSample>, String> {
    let mut samples = Vec::new();
    for (index, raw) in body.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let sample =
            parse_sample(line).map_err(|reason| format!("line {}: {}", index + 1, reason))?;
        samples.push(sample);
    }
    Ok(samples)
}

fn parse_sample(line: &str) -> Result<MetricSample, String> {
    let name_end = line
        .find(|c: char| c == '{' || c.is_whitespace())
        .ok_or_else(|| "sample has no value".to_string())?;
    let name = &line[..name_end];
    if !is_metric_name(name) {
        return Err(format!("invalid metric name '{}'", name));
    }

    let mut rest = &line[name_end..];
    if rest.starts_with('{') {
        let close = label_block_end(rest)?;
        rest = &rest[close + 1..];
    }

    let mut fields = rest.split_whitespace();
    let value = fields
        .next()
        .ok_or_else(|| format!("{} has no value", name))?;
    let value = parse_value(value).ok_or_else(|| format!("invalid value '{}'", value))?;
    if let Some(timestamp) = fields.next()
        && timestamp.parse::<i64>().is_err()
    {
        return Err(format!("invalid timestamp '{}'", timestamp));
    }
    if fields.next().is_some() {
        return Err("trailing data after timestamp".to_string());
    }

    Ok(MetricSample {
        name: name.to_string(),
        value,
    })
}

fn is_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Index of the `}` closing a label block, honouring quoted values.
fn label_block_end(block: &str) -> Result<usize, String> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in block.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '}' if !in_quotes => return Ok(i),
            _ => {}
        }
    }
    Err("unterminated label set".to_string())
}

fn parse_value(value: &str) -> Option<f64> {
    match value {
        "+Inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typical_exposition() {
        let body = r#"# HELP http_requests_total Total requests.
# TYPE http_requests_total counter
http_requests_total{method="get",code="200"} 1027 1395066363000
http_requests_total{method="post",code="400"} 3

process_resident_memory_bytes 2.1e+07
latency_bucket{le="+Inf"} +Inf
"#;
        let samples = parse_exposition(body).unwrap();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0].name, "http_requests_total");
        assert_eq!(samples[0].value, 1027.0);
        assert_eq!(samples[2].value, 2.1e7);
        assert!(samples[3].value.is_infinite());
    }

    #[test]
    fn label_values_may_contain_braces_and_quotes() {
        let body = r#"requests{path="/a}b",msg="say \"hi\""} 1"#;
        let samples = parse_exposition(body).unwrap();
        assert_eq!(samples[0].value, 1.0);
    }

    #[test]
    fn malformed_lines_report_line_number() {
        let err = parse_exposition("ok 1\nbroken{a=\"b\" 2\n").unwrap_err();
        assert!(err.starts_with("line 2:"), "{err}");

        assert!(parse_exposition("9lives 1").is_err());
        assert!(parse_exposition("name_only").is_err());
        assert!(parse_exposition("value_bad abc").is_err());
        assert!(parse_exposition("ts_bad 1 soon").is_err());
    }

    #[test]
    fn html_is_not_exposition() {
        assert!(parse_exposition("<html><body>Not found</body></html>").is_err());
    }

    #[test]
    fn latest_revision_picks_highest() {
        let json = r#"[
            {"revision": 4, "status": "superseded", "chart": "demo-0.1.0", "app_version": "1.0", "updated": "", "description": "Upgrade complete"},
            {"revision": 5, "status": "deployed", "chart": "demo-0.1.1", "app_version": "1.1", "updated": "", "description": "Upgrade complete"}
        ]"#;
        let history = parse_history(json).unwrap();
        let latest = latest_revision(&history).unwrap();
        assert_eq!(latest.revision, 5);
        assert_eq!(latest.status, "deployed");
    }

    #[test]
    fn history_tolerates_missing_optional_fields() {
        let history = parse_history(r#"[{"revision": 1, "status": "failed"}]"#).unwrap();
        assert_eq!(history[0].status, "failed");
        assert!(parse_history("Error: release not found").is_err());
    }
}
