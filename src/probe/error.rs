//! 测量失败类型。所有失败都只影响当前主机对：保留原代价、记录日志、继续下一对。

use crate::net::MacAddr;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to run measurement tool: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("measurement timed out after {0}s")]
    Timeout(u64),
    #[error("measurement timeout of {0}s is out of range")]
    InvalidTimeout(u64),
    #[error("measurement cancelled")]
    Cancelled,
    #[error("measurement tool exited with {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },
    #[error("unparseable measurement output: {0:?}")]
    Unparseable(String),
    #[error("host {0} has no network address")]
    MissingAddress(MacAddr),
    #[error("no testbed name for host {0}")]
    UnknownHost(MacAddr),
}
