//! 测量触发策略
//!
//! 拓扑发生变化后等待一段静默期再测量，而不是按收到的报文数计数触发；
//! 可选地在上一轮测量之后按固定间隔重新测量。

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct QuietPeriodTrigger {
    quiet: Duration,
    reprobe: Option<Duration>,
    pending: bool,
    last_change: Option<Instant>,
    last_sweep: Option<Instant>,
}

impl QuietPeriodTrigger {
    pub fn new(quiet: Duration, reprobe: Option<Duration>) -> Self {
        Self {
            quiet,
            reprobe,
            pending: false,
            last_change: None,
            last_sweep: None,
        }
    }

    /// 记录一次拓扑变化，重新开始静默计时
    pub fn note_change(&mut self, now: Instant) {
        self.pending = true;
        self.last_change = Some(now);
    }

    pub fn should_fire(&self, now: Instant) -> bool {
        if self.pending {
            return self
                .last_change
                .is_none_or(|t| now.saturating_duration_since(t) >= self.quiet);
        }
        match (self.reprobe, self.last_sweep) {
            (Some(every), Some(last)) => now.saturating_duration_since(last) >= every,
            _ => false,
        }
    }

    pub fn mark_fired(&mut self, now: Instant) {
        self.pending = false;
        self.last_sweep = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}
