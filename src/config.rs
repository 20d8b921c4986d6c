//! 控制器配置
//!
//! 以 JSON 描述；所有字段都有默认值，缺省的配置即可运行一个只做学习转发的控制器。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::{LearningTable, MacAddr, SwitchId, Topology, TopologyError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid topology weight: {0}")]
    Topology(#[from] TopologyError),
    #[error("invalid probe config: {0}")]
    Probe(String),
}

/// 某个方向链路的静态权重
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkWeight {
    pub src: SwitchId,
    pub dst: SwitchId,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// 学习表项存活时间（秒）。None 表示永不过期。
    pub ttl_secs: Option<u64>,
    pub max_entries_per_switch: Option<usize>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            ttl_secs: Some(300),
            max_entries_per_switch: Some(4096),
        }
    }
}

/// 外部测量工具的命令模板。
///
/// `args` 中可使用占位符 `{client}`、`{server}`（测试床主机名）、`{client_ip}`、`{server_ip}`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_probe_timeout_secs() -> u64 {
    30
}

/// 单次测量允许的最长超时（一天）
pub const MAX_PROBE_TIMEOUT_SECS: u64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub enabled: bool,
    /// 拓扑静默多久之后才开始测量（毫秒）
    pub quiet_period_ms: u64,
    /// 周期性重新测量的间隔（秒）
    pub reprobe_interval_secs: Option<u64>,
    /// 代价 = reference_mbps / 实测 Mbps
    pub reference_mbps: f64,
    pub command: Option<CommandSpec>,
    /// 硬件地址 -> 测试床主机名
    pub host_names: BTreeMap<MacAddr, String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            quiet_period_ms: 2000,
            reprobe_interval_secs: None,
            reference_mbps: 1000.0,
            command: None,
            host_names: BTreeMap::new(),
        }
    }
}

impl ProbeConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn reprobe_interval(&self) -> Option<Duration> {
        self.reprobe_interval_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub default_link_cost: f64,
    pub link_weights: Vec<LinkWeight>,
    pub flow_priority: u16,
    pub path_priority: u16,
    pub table_miss_priority: u16,
    /// 沿最短路在下游交换机上预装流表
    pub install_paths: bool,
    pub learning: LearningConfig,
    pub host_ttl_secs: Option<u64>,
    pub probe: ProbeConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_link_cost: 1.0,
            link_weights: Vec::new(),
            flow_priority: 1,
            path_priority: 1,
            table_miss_priority: 0,
            install_paths: true,
            learning: LearningConfig::default(),
            host_ttl_secs: Some(600),
            probe: ProbeConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// 解析并校验
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: ControllerConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// 启动时校验：负权或非有限权重是致命错误。
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::net::validate_default_cost(self.default_link_cost)?;
        for w in &self.link_weights {
            w.src.validate()?;
            w.dst.validate()?;
            crate::net::validate_link_weight(w.src, w.dst, w.cost)?;
        }
        let r = self.probe.reference_mbps;
        if !r.is_finite() || r <= 0.0 {
            return Err(ConfigError::Probe(format!(
                "reference_mbps must be positive, got {r}"
            )));
        }
        if self.probe.enabled && self.probe.command.is_none() {
            return Err(ConfigError::Probe(
                "probing is enabled but no command is configured".into(),
            ));
        }
        if let Some(cmd) = &self.probe.command {
            if cmd.timeout_secs == 0 || cmd.timeout_secs > MAX_PROBE_TIMEOUT_SECS {
                return Err(ConfigError::Probe(format!(
                    "command timeout_secs must be within 1..={MAX_PROBE_TIMEOUT_SECS}, got {}",
                    cmd.timeout_secs
                )));
            }
        }
        Ok(())
    }

    /// 按配置构造空拓扑并写入静态权重
    pub fn build_topology(&self) -> Result<Topology, ConfigError> {
        let mut topo = Topology::new(self.default_link_cost);
        for w in &self.link_weights {
            topo.set_configured_weight(w.src, w.dst, w.cost)?;
        }
        Ok(topo)
    }

    pub fn build_learning_table(&self) -> LearningTable {
        LearningTable::new(self.learning_ttl(), self.learning.max_entries_per_switch)
    }

    pub fn learning_ttl(&self) -> Option<Duration> {
        self.learning.ttl_secs.map(Duration::from_secs)
    }

    pub fn host_ttl(&self) -> Option<Duration> {
        self.host_ttl_secs.map(Duration::from_secs)
    }
}
