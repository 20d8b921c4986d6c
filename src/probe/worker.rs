//! 测量工作线程
//!
//! 一轮全主机对测量可能持续数十秒，因此放在独立线程中执行；结果逐条通过消息通道交回
//! 持有拓扑的事件循环，由事件循环写入链路代价。报文处理不会被测量阻塞。

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread;

use tracing::{debug, error, info, warn};

use super::error::ProbeError;
use super::tool::{MeasureRequest, ThroughputTool};

/// 测量轮次编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SweepId(pub u64);

/// 可跨线程共享的取消标记
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// 一轮测量任务
#[derive(Debug, Clone)]
pub struct SweepJob {
    pub id: SweepId,
    pub requests: Vec<MeasureRequest>,
    pub cancel: CancelToken,
}

/// 工作线程发回的消息
#[derive(Debug)]
pub enum ProbeMessage {
    Measured {
        sweep: SweepId,
        request: MeasureRequest,
        result: Result<f64, ProbeError>,
    },
    Finished {
        sweep: SweepId,
        cancelled: bool,
        succeeded: usize,
        failed: usize,
    },
}

/// 在当前线程执行一轮测量。
///
/// 单个主机对失败不会中断本轮；`emit` 返回 false（接收端已关闭）或任务被取消时提前结束。
#[tracing::instrument(skip(tool, job, emit), fields(sweep = job.id.0, pairs = job.requests.len()))]
pub fn run_sweep(
    tool: &dyn ThroughputTool,
    job: &SweepJob,
    emit: &mut dyn FnMut(ProbeMessage) -> bool,
) {
    info!("📶 开始带宽测量");
    let mut succeeded = 0;
    let mut failed = 0;

    for req in &job.requests {
        if job.cancel.is_cancelled() {
            break;
        }
        if req.client == req.server {
            continue;
        }
        let result = tool.measure(req, &job.cancel);
        match &result {
            Ok(mbps) => {
                succeeded += 1;
                debug!(client = %req.client, server = %req.server, mbps, "测量完成");
            }
            Err(ProbeError::Cancelled) => break,
            Err(e) => {
                failed += 1;
                warn!(client = %req.client, server = %req.server, error = %e, "测量失败");
            }
        }
        if !emit(ProbeMessage::Measured {
            sweep: job.id,
            request: req.clone(),
            result,
        }) {
            return;
        }
    }

    let cancelled = job.cancel.is_cancelled();
    info!(succeeded, failed, cancelled, "带宽测量结束");
    emit(ProbeMessage::Finished {
        sweep: job.id,
        cancelled,
        succeeded,
        failed,
    });
}

/// 测量线程句柄
pub struct ProberHandle {
    jobs: Option<Sender<SweepJob>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ProberHandle {
    /// 启动测量线程；结果以 `T::from(ProbeMessage)` 的形式发往 `outbox`。
    pub fn spawn<T>(tool: Arc<dyn ThroughputTool>, outbox: Sender<T>) -> std::io::Result<Self>
    where
        T: From<ProbeMessage> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<SweepJob>();
        let thread = thread::Builder::new()
            .name("bandwidth-prober".into())
            .spawn(move || {
                for job in rx {
                    let mut open = true;
                    let mut emit = |m: ProbeMessage| {
                        open = outbox.send(T::from(m)).is_ok();
                        open
                    };
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        run_sweep(tool.as_ref(), &job, &mut emit)
                    }));
                    if !open {
                        debug!("结果通道已关闭");
                        break;
                    }
                    if outcome.is_err() {
                        // 工具崩溃时本轮按取消结束，事件循环才能释放这一轮并继续调度。
                        error!(sweep = job.id.0, "💥 测量线程中工具崩溃，本轮中止");
                        let finished = ProbeMessage::Finished {
                            sweep: job.id,
                            cancelled: true,
                            succeeded: 0,
                            failed: 0,
                        };
                        if outbox.send(T::from(finished)).is_err() {
                            break;
                        }
                    }
                }
                debug!("测量线程退出");
            })?;
        Ok(Self {
            jobs: Some(tx),
            thread: Some(thread),
        })
    }

    /// 提交一轮测量；线程已退出时返回 false
    pub fn submit(&self, job: SweepJob) -> bool {
        self.jobs.as_ref().is_some_and(|tx| tx.send(job).is_ok())
    }

    /// 测量线程是否仍在运行
    pub fn is_alive(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// 关闭任务通道并等待线程结束（会等待进行中的一轮测量，调用前应先取消）
    pub fn shutdown(mut self) {
        self.jobs.take();
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

impl Drop for ProberHandle {
    fn drop(&mut self) {
        // 只关闭通道，不等待线程。
        self.jobs.take();
    }
}
