//! 事件循环
//!
//! 单一的事件分发上下文：控制事件与测量结果都通过同一个消息通道进入，按到达顺序逐个处理，
//! 拓扑存储与学习表只在这里被修改，无需加锁。测量在独立线程上运行，只通过消息交回结果。

use std::io::Write;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::controller::Controller;
use super::event::ControlEvent;
use super::instruction::Instruction;
use crate::probe::{ProbeMessage, ProberHandle};

/// 事件循环收件箱
#[derive(Debug)]
pub enum Inbox {
    Control(ControlEvent),
    Probe(ProbeMessage),
    Shutdown,
}

impl From<ProbeMessage> for Inbox {
    fn from(m: ProbeMessage) -> Self {
        Inbox::Probe(m)
    }
}

impl From<ControlEvent> for Inbox {
    fn from(ev: ControlEvent) -> Self {
        Inbox::Control(ev)
    }
}

/// 指令出口。返回 false 表示下游已关闭，事件循环随之结束。
pub trait InstructionSink {
    fn emit(&mut self, ins: Instruction) -> bool;
}

impl InstructionSink for Vec<Instruction> {
    fn emit(&mut self, ins: Instruction) -> bool {
        self.push(ins);
        true
    }
}

impl InstructionSink for Sender<Instruction> {
    fn emit(&mut self, ins: Instruction) -> bool {
        self.send(ins).is_ok()
    }
}

/// 每条指令一行 JSON
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> InstructionSink for JsonLinesSink<W> {
    fn emit(&mut self, ins: Instruction) -> bool {
        let line = match serde_json::to_string(&ins) {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "指令序列化失败");
                return true;
            }
        };
        writeln!(self.out, "{line}").and_then(|_| self.out.flush()).is_ok()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchStats {
    pub control_events: u64,
    pub probe_messages: u64,
    pub instructions: u64,
    pub sweeps_submitted: u64,
    /// 因测量线程不可用而放弃的轮次
    pub sweeps_abandoned: u64,
}

/// 事件循环结束后交还的状态
pub struct DispatchOutcome<S> {
    pub controller: Controller,
    pub sink: S,
    pub stats: DispatchStats,
}

pub struct Dispatcher<S: InstructionSink> {
    controller: Controller,
    inbox: Receiver<Inbox>,
    sink: S,
    prober: Option<ProberHandle>,
    tick: Duration,
    stats: DispatchStats,
}

impl<S: InstructionSink> Dispatcher<S> {
    pub fn new(controller: Controller, inbox: Receiver<Inbox>, sink: S) -> Self {
        Self {
            controller,
            inbox,
            sink,
            prober: None,
            tick: Duration::from_millis(100),
            stats: DispatchStats::default(),
        }
    }

    /// 启用测量线程。测量线程持有收件箱的发送端，因此关闭需要显式发送 `Inbox::Shutdown`。
    pub fn with_prober(mut self, prober: ProberHandle) -> Self {
        self.prober = Some(prober);
        self
    }

    /// 无消息时检查测量触发条件的间隔
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// 运行直到收到 `Shutdown`、所有发送端关闭或指令出口关闭。
    #[tracing::instrument(skip(self), fields(tick_ms = self.tick.as_millis() as u64))]
    pub fn run(mut self) -> DispatchOutcome<S> {
        info!("▶️  事件循环启动");
        'outer: loop {
            match self.inbox.recv_timeout(self.tick) {
                Ok(Inbox::Control(ev)) => {
                    self.stats.control_events += 1;
                    let out = self.controller.handle(Instant::now(), ev);
                    for ins in out {
                        self.stats.instructions += 1;
                        if !self.sink.emit(ins) {
                            warn!("指令出口已关闭，退出事件循环");
                            break 'outer;
                        }
                    }
                }
                Ok(Inbox::Probe(msg)) => {
                    self.stats.probe_messages += 1;
                    self.controller.apply_probe(Instant::now(), msg);
                }
                Ok(Inbox::Shutdown) => {
                    debug!("收到关闭消息");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("收件箱所有发送端已关闭");
                    break;
                }
            }
            self.maybe_start_sweep();
        }

        self.controller.cancel_sweep();
        if let Some(prober) = self.prober.take() {
            prober.shutdown();
        }
        info!(
            control_events = self.stats.control_events,
            probe_messages = self.stats.probe_messages,
            instructions = self.stats.instructions,
            "✅ 事件循环结束"
        );
        DispatchOutcome {
            controller: self.controller,
            sink: self.sink,
            stats: self.stats,
        }
    }

    fn maybe_start_sweep(&mut self) {
        let Some(prober) = self.prober.as_ref() else {
            return;
        };
        if !prober.is_alive() {
            let in_flight = self.controller.sweep_in_flight();
            error!(in_flight, "测量线程已退出，停止带宽测量");
            if in_flight {
                self.stats.sweeps_abandoned += 1;
                self.controller.cancel_sweep();
            }
            self.prober = None;
            return;
        }
        let Some(job) = self.controller.poll_probe(Instant::now()) else {
            return;
        };
        let id = job.id;
        if prober.submit(job) {
            self.stats.sweeps_submitted += 1;
        } else {
            warn!(sweep = id.0, "测量线程不可用，放弃本轮");
            self.stats.sweeps_abandoned += 1;
            self.controller.cancel_sweep();
        }
    }
}
