//! 回放场景
//!
//! 一个 JSON 文件描述控制器配置、可选的内置拓扑，以及按顺序交给控制器的事件，
//! 用于离线复现转发决策与路径计算。

use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{ConfigError, ControllerConfig};
use crate::ctrl::{ControlEvent, Controller, Instruction};
use crate::net::{PathResult, RouteError, SwitchId};
use crate::topo::DeclaredTopology;
use crate::topo::bw_mesh::{BwMeshOpts, build_bw_mesh};
use crate::topo::six_switch::build_six_switch;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub schema_version: u32,
    #[serde(default)]
    pub config: Option<ControllerConfig>,
    #[serde(default)]
    pub topology: Option<TopologySpec>,
    /// 相邻事件之间推进的时间（毫秒）
    #[serde(default)]
    pub step_ms: u64,
    #[serde(default)]
    pub events: Vec<ControlEvent>,
    #[serde(default)]
    pub queries: Vec<PathQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySpec {
    SixSwitch,
    BwMesh {
        #[serde(default)]
        reference_mbps: Option<f64>,
    },
}

impl TopologySpec {
    pub fn declare(&self) -> DeclaredTopology {
        match self {
            TopologySpec::SixSwitch => build_six_switch(),
            TopologySpec::BwMesh { reference_mbps } => {
                let mut opts = BwMeshOpts::default();
                if let Some(r) = reference_mbps {
                    opts.reference_mbps = *r;
                }
                build_bw_mesh(&opts)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathQuery {
    pub src: SwitchId,
    pub dst: SwitchId,
}

/// 回放结果
pub struct Replay {
    pub controller: Controller,
    pub instructions: Vec<Instruction>,
    pub routes: Vec<(PathQuery, Result<PathResult, RouteError>)>,
}

impl ScenarioSpec {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// 合并配置与拓扑声明，得到最终配置和事件序列（拓扑声明的事件在前）。
    ///
    /// `override_cfg` 优先于场景内嵌的配置。
    pub fn prepare(
        &self,
        override_cfg: Option<ControllerConfig>,
    ) -> Result<(ControllerConfig, Vec<ControlEvent>), ConfigError> {
        let mut cfg = override_cfg
            .or_else(|| self.config.clone())
            .unwrap_or_default();
        let mut events = Vec::new();
        if let Some(spec) = &self.topology {
            let declared = spec.declare();
            declared.apply_to(&mut cfg);
            events.extend(declared.events());
        }
        events.extend(self.events.iter().cloned());
        cfg.validate()?;
        Ok((cfg, events))
    }

    /// 在虚拟时钟上逐个回放事件，然后执行路径查询
    pub fn replay(&self, override_cfg: Option<ControllerConfig>) -> Result<Replay, ConfigError> {
        let (cfg, events) = self.prepare(override_cfg)?;
        let mut controller = Controller::new(cfg)?;

        let start = Instant::now();
        let step = Duration::from_millis(self.step_ms);
        let mut now = start;
        let mut instructions = Vec::new();
        for ev in events {
            instructions.extend(controller.handle(now, ev));
            now += step;
        }

        let routes = self
            .queries
            .iter()
            .map(|q| (*q, controller.route(q.src, q.dst)))
            .collect();

        info!(
            events = controller.stats.events,
            dropped = controller.stats.dropped,
            instructions = instructions.len(),
            "回放完成"
        );
        Ok(Replay {
            controller,
            instructions,
            routes,
        })
    }
}
