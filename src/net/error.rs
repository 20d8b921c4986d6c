//! 拓扑与路由错误类型

use super::id::{MacAddr, PortNo, SwitchId};

/// 拓扑存储的校验错误。
///
/// `NegativeWeight` 属于配置级错误，调用方应视为致命；其余为单事件的校验失败，
/// 记录日志后丢弃该事件即可。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TopologyError {
    #[error("invalid switch id {0}")]
    InvalidSwitch(u64),
    #[error("invalid port {port} on {switch}")]
    InvalidPort { switch: SwitchId, port: PortNo },
    #[error("invalid host address {0}")]
    InvalidAddress(MacAddr),
    #[error("negative weight {cost} on link {src} -> {dst}")]
    NegativeWeight {
        src: SwitchId,
        dst: SwitchId,
        cost: f64,
    },
    #[error("non-finite weight on link {src} -> {dst}")]
    InvalidWeight { src: SwitchId, dst: SwitchId },
    #[error("default link cost must be finite and non-negative, got {0}")]
    InvalidDefaultCost(f64),
}

impl TopologyError {
    /// 是否为必须上报的配置级错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TopologyError::NegativeWeight { .. } | TopologyError::InvalidDefaultCost(_)
        )
    }
}

/// 最短路计算失败原因（均非致命，调用方回退为泛洪）。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteError {
    #[error("source switch {0} not in topology")]
    SourceNotFound(SwitchId),
    #[error("destination switch {0} not in topology")]
    DestinationNotFound(SwitchId),
    #[error("no path from {src} to {dst}")]
    NoPathExists { src: SwitchId, dst: SwitchId },
    #[error("negative weight {cost} on edge {src} -> {dst}")]
    NegativeWeight {
        src: SwitchId,
        dst: SwitchId,
        cost: f64,
    },
}

/// 校验链路权重：非负且有限。
pub fn validate_link_weight(src: SwitchId, dst: SwitchId, cost: f64) -> Result<f64, TopologyError> {
    if !cost.is_finite() {
        return Err(TopologyError::InvalidWeight { src, dst });
    }
    if cost < 0.0 {
        return Err(TopologyError::NegativeWeight { src, dst, cost });
    }
    Ok(cost)
}

pub fn validate_default_cost(cost: f64) -> Result<f64, TopologyError> {
    if !cost.is_finite() || cost < 0.0 {
        return Err(TopologyError::InvalidDefaultCost(cost));
    }
    Ok(cost)
}
