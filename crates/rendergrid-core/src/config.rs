//! rendergrid.toml deployment profile parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{PoolKind, ValidityResult};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_APPROACHING_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub batch: BatchAccountConfig,
    pub turn_pool: PoolProfile,
    pub rendering_pool: PoolProfile,
    pub capacity: Option<CapacityConfig>,
    pub polling: Option<PollingConfig>,
    pub signaling: Option<SignalingConfig>,
    pub dispatch: Option<DispatchConfig>,
}

/// Credentials for the batch backend account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAccountConfig {
    pub account_url: String,
    pub account_name: String,
    pub account_key: String,
}

/// How pools of one kind are provisioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolProfile {
    pub vm_size: String,
    pub image: String,
    pub node_agent_sku: Option<String>,
    /// Dedicated nodes requested when the pool is created.
    pub dedicated_nodes: u32,
    /// Ceiling enforced on resize requests.
    pub max_dedicated_nodes: u32,
    /// Node-local setup script run by configuration tasks.
    pub setup_script: Option<String>,
    /// Rendering slots each node provides. Required for rendering pools.
    pub slots_per_node: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityConfig {
    /// Fraction of slot capacity above which scale-out should start.
    pub approaching_threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Fixed poll interval (e.g., "5s", "500ms").
    pub interval: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingConfig {
    pub server_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// HTTP endpoint that accepts action batches.
    pub endpoint: Option<String>,
}

impl DeploymentConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Profile used for pools of the given kind.
    pub fn pool_profile(&self, kind: PoolKind) -> &PoolProfile {
        match kind {
            PoolKind::TurnRelay => &self.turn_pool,
            PoolKind::Rendering => &self.rendering_pool,
        }
    }

    /// Rendering slots per node; zero when the profile leaves it out.
    pub fn slots_per_node(&self) -> u32 {
        self.rendering_pool.slots_per_node.unwrap_or(0)
    }

    pub fn approaching_threshold(&self) -> f64 {
        self.capacity
            .as_ref()
            .and_then(|c| c.approaching_threshold)
            .unwrap_or(DEFAULT_APPROACHING_THRESHOLD)
    }

    /// Poll interval for convergence loops. Unparsable values fall back to 5s;
    /// `validate()` reports them.
    pub fn poll_interval(&self) -> Duration {
        self.polling
            .as_ref()
            .and_then(|p| p.interval.as_deref())
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    pub fn signaling_server_url(&self) -> Option<&str> {
        self.signaling.as_ref()?.server_url.as_deref()
    }

    pub fn dispatch_endpoint(&self) -> Option<&str> {
        self.dispatch.as_ref()?.endpoint.as_deref()
    }

    /// Check the profile and report the first violated constraint.
    ///
    /// Optional sections that are absent are never a violation.
    pub fn validate(&self) -> ValidityResult {
        match self.first_violation() {
            Some(reason) => ValidityResult::Invalid(reason),
            None => ValidityResult::Valid,
        }
    }

    fn first_violation(&self) -> Option<String> {
        let batch = &self.batch;
        if batch.account_url.trim().is_empty() {
            return Some("batch.account_url is required".to_string());
        }
        if !is_http_url(&batch.account_url) {
            return Some(format!(
                "batch.account_url must be an http(s) URL, got '{}'",
                batch.account_url
            ));
        }
        if batch.account_name.trim().is_empty() {
            return Some("batch.account_name is required".to_string());
        }
        if batch.account_key.trim().is_empty() {
            return Some("batch.account_key is required".to_string());
        }

        for (section, profile) in [
            ("turn_pool", &self.turn_pool),
            ("rendering_pool", &self.rendering_pool),
        ] {
            if let Some(reason) = profile.first_violation(section) {
                return Some(reason);
            }
        }

        match self.rendering_pool.slots_per_node {
            None | Some(0) => {
                return Some("rendering_pool.slots_per_node must be at least 1".to_string());
            }
            Some(_) => {}
        }
        if self
            .rendering_pool
            .setup_script
            .as_deref()
            .is_none_or(|s| s.trim().is_empty())
        {
            return Some("rendering_pool.setup_script is required".to_string());
        }

        let threshold = self.approaching_threshold();
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Some(format!(
                "capacity.approaching_threshold must be in (0, 1], got {threshold}"
            ));
        }

        if let Some(raw) = self.polling.as_ref().and_then(|p| p.interval.as_deref()) {
            match parse_duration(raw) {
                Some(d) if !d.is_zero() => {}
                _ => return Some(format!("polling.interval '{raw}' is not a positive duration")),
            }
        }

        if let Some(url) = self.signaling_server_url()
            && !is_http_url(url)
        {
            return Some(format!("signaling.server_url must be an http(s) URL, got '{url}'"));
        }

        if let Some(endpoint) = self.dispatch_endpoint()
            && !endpoint.starts_with("http://")
        {
            return Some(format!(
                "dispatch.endpoint must be a plain http:// URL, got '{endpoint}'"
            ));
        }

        None
    }

    /// Scaffold a profile with sensible defaults for local development.
    pub fn scaffold(account_name: &str) -> Self {
        DeploymentConfig {
            batch: BatchAccountConfig {
                account_url: format!("https://{account_name}.batch.azure.com"),
                account_name: account_name.to_string(),
                account_key: "<account-key>".to_string(),
            },
            turn_pool: PoolProfile {
                vm_size: "standard_a1_v2".to_string(),
                image: "ubuntu-server-22.04".to_string(),
                node_agent_sku: Some("batch.node.ubuntu 22.04".to_string()),
                dedicated_nodes: 1,
                max_dedicated_nodes: 4,
                setup_script: None,
                slots_per_node: None,
            },
            rendering_pool: PoolProfile {
                vm_size: "standard_nv6".to_string(),
                image: "windows-server-2019".to_string(),
                node_agent_sku: Some("batch.node.windows amd64".to_string()),
                dedicated_nodes: 2,
                max_dedicated_nodes: 20,
                setup_script: Some("scripts/configure-rendering-node.ps1".to_string()),
                slots_per_node: Some(1),
            },
            capacity: Some(CapacityConfig {
                approaching_threshold: Some(DEFAULT_APPROACHING_THRESHOLD),
            }),
            polling: Some(PollingConfig {
                interval: Some("5s".to_string()),
            }),
            signaling: None,
            dispatch: None,
        }
    }
}

impl PoolProfile {
    fn first_violation(&self, section: &str) -> Option<String> {
        if self.vm_size.trim().is_empty() {
            return Some(format!("{section}.vm_size is required"));
        }
        if self.image.trim().is_empty() {
            return Some(format!("{section}.image is required"));
        }
        if self.max_dedicated_nodes == 0 {
            return Some(format!("{section}.max_dedicated_nodes must be at least 1"));
        }
        if self.dedicated_nodes > self.max_dedicated_nodes {
            return Some(format!(
                "{section}.dedicated_nodes ({}) exceeds max_dedicated_nodes ({})",
                self.dedicated_nodes, self.max_dedicated_nodes
            ));
        }
        if let Some(script) = &self.setup_script
            && script.trim().is_empty()
        {
            return Some(format!("{section}.setup_script must not be empty when set"));
        }
        None
    }
}

fn is_http_url(s: &str) -> bool {
    let rest = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"));
    rest.is_some_and(|host| !host.is_empty())
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
