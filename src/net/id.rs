//! 标识符类型
//!
//! 定义交换机、端口和硬件地址的标识符，以及它们的合法性校验。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::TopologyError;

/// 交换机端口号
pub type PortNo = u32;

/// 最大的合法物理端口号；更大的值为保留端口（FLOOD/CONTROLLER 等）。
pub const PORT_MAX: PortNo = 0xffff_ff00;

/// 交换机标识符（datapath id）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwitchId(pub u64);

impl SwitchId {
    /// datapath id 为 0 视为非法。
    pub fn validate(self) -> Result<Self, TopologyError> {
        if self.0 == 0 {
            return Err(TopologyError::InvalidSwitch(self.0));
        }
        Ok(self)
    }
}

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// 校验物理端口号
pub fn validate_port(switch: SwitchId, port: PortNo) -> Result<PortNo, TopologyError> {
    if port == 0 || port > PORT_MAX {
        return Err(TopologyError::InvalidPort { switch, port });
    }
    Ok(port)
}

/// 以太网硬件地址
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    /// 组播位（含广播）
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// 主机地址与帧源地址必须是非零单播地址。
    pub fn validate_unicast(self) -> Result<Self, TopologyError> {
        if self.is_zero() || self.is_multicast() {
            return Err(TopologyError::InvalidAddress(self));
        }
        Ok(self)
    }

    /// 由末字节构造形如 `00:00:00:00:00:NN` 的测试床地址。
    pub fn from_index(n: u8) -> Self {
        MacAddr([0, 0, 0, 0, 0, n])
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// 地址字符串解析失败
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed hardware address: {0:?}")]
pub struct ParseMacError(pub String);

impl FromStr for MacAddr {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for byte in out.iter_mut() {
            let part = parts.next().ok_or_else(|| ParseMacError(s.to_string()))?;
            if part.len() != 2 {
                return Err(ParseMacError(s.to_string()));
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| ParseMacError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(ParseMacError(s.to_string()));
        }
        Ok(MacAddr(out))
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
