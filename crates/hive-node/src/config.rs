use anyhow::Result;
use hive_distribution::{LeaderRule, ResolverConfig};
use hive_work::{
    AbstentionPolicy, AssignmentConfig, AuditConfig, RewardConfig, RoundCacheConfig,
    DEFAULT_SENTINELS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "hive-config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSettings,
    #[serde(default)]
    pub task: TaskConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub collaborators: CollaboratorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    pub name: String,
    /// JSON file of work units loaded into the store at start-up
    pub units_file: Option<PathBuf>,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            name: "hive-node".to_string(),
            units_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub task_id: String,
    pub max_assignees: usize,
    pub round_bounty: u64,
    pub leader_rule: LeaderRule,
    pub abstention: AbstentionPolicy,
    pub sentinels: Vec<String>,
    /// Processed-round cache window
    pub round_cache_secs: u64,
    pub round_cache_capacity: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        let cache = RoundCacheConfig::default();
        Self {
            task_id: String::new(),
            max_assignees: hive_types::DEFAULT_MAX_ASSIGNEES,
            round_bounty: 0,
            leader_rule: LeaderRule::default(),
            abstention: AbstentionPolicy::default(),
            sentinels: DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect(),
            round_cache_secs: cache.window.as_secs(),
            round_cache_capacity: cache.capacity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 10000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    /// Blob store gateway
    pub ipfs_gateway: Option<String>,
    /// Chain JSON-RPC endpoint
    pub rpc_url: Option<String>,
    /// Work-product checker service
    pub checker_url: Option<String>,
    pub timeout_secs: u64,
    /// Ask the RPC node for snappy-compressed account data
    #[serde(default = "default_compressed_accounts")]
    pub compressed_accounts: bool,
}

fn default_compressed_accounts() -> bool {
    true
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            ipfs_gateway: None,
            rpc_url: None,
            checker_url: None,
            timeout_secs: 30,
            compressed_accounts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// pretty, compact or json
    pub format: String,
    pub file_output: Option<PathBuf>,
    #[serde(default)]
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_output: None,
            module_filters: HashMap::new(),
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(task_id) = env::var("TASK_ID") {
            if !task_id.is_empty() {
                self.task.task_id = task_id;
            }
        }
        if let Ok(max) = env::var("MAX_ASSIGNEES") {
            if let Ok(max) = max.parse() {
                self.task.max_assignees = max;
            }
        }
        if let Ok(bounty) = env::var("ROUND_BOUNTY") {
            if let Ok(bounty) = bounty.parse() {
                self.task.round_bounty = bounty;
            }
        }

        if let Ok(api_host) = env::var("API_HOST") {
            self.api.host = api_host;
        }
        if let Ok(api_port) = env::var("API_PORT") {
            if let Ok(port) = api_port.parse() {
                self.api.port = port;
            }
        }

        if let Ok(gateway) = env::var("IPFS_GATEWAY") {
            self.collaborators.ipfs_gateway = Some(gateway).filter(|s| !s.is_empty());
        }
        if let Ok(rpc) = env::var("RPC_URL") {
            self.collaborators.rpc_url = Some(rpc).filter(|s| !s.is_empty());
        }
        if let Ok(checker) = env::var("CHECKER_URL") {
            self.collaborators.checker_url = Some(checker).filter(|s| !s.is_empty());
        }
        if let Ok(compressed) = env::var("RPC_COMPRESSED_ACCOUNTS") {
            if let Ok(compressed) = compressed.parse() {
                self.collaborators.compressed_accounts = compressed;
            }
        }
        if let Ok(timeout) = env::var("COLLABORATOR_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.collaborators.timeout_secs = secs;
            }
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborators.timeout_secs)
    }

    pub fn assignment_config(&self) -> AssignmentConfig {
        AssignmentConfig {
            task_id: self.task.task_id.clone(),
            max_assignees: self.task.max_assignees,
        }
    }

    pub fn audit_config(&self) -> AuditConfig {
        AuditConfig {
            task_id: self.task.task_id.clone(),
            sentinels: self.task.sentinels.clone(),
            collaborator_timeout: self.collaborator_timeout(),
            abstention: self.task.abstention,
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            task_id: self.task.task_id.clone(),
            leader_rule: self.task.leader_rule,
            fetch_timeout: self.collaborator_timeout(),
        }
    }

    pub fn reward_config(&self) -> RewardConfig {
        RewardConfig {
            round_bounty: self.task.round_bounty,
        }
    }

    pub fn round_cache_config(&self) -> RoundCacheConfig {
        RoundCacheConfig {
            capacity: self.task.round_cache_capacity,
            window: Duration::from_secs(self.task.round_cache_secs),
        }
    }
}
