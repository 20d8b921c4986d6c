//! 在线控制器
//!
//! 从标准输入逐行读取 JSON 事件，转发指令以 JSON 行写到标准输出；
//! 开启测量时带宽测量在独立线程中运行。日志写到标准错误。

use clap::Parser;
use sdnctl_rs::config::ControllerConfig;
use sdnctl_rs::ctrl::{ControlEvent, Controller, Dispatcher, Inbox, JsonLinesSink};
use sdnctl_rs::probe::{CommandTool, ProberHandle};
use sdnctl_rs::scenario::TopologySpec;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "sdnctl", about = "SDN controller core: JSON events on stdin, instructions on stdout")]
struct Args {
    /// Controller config (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Preload a built-in topology: six_switch or bw_mesh
    #[arg(long)]
    topology: Option<String>,

    /// Idle tick for the probe trigger (ms)
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    };
    let preload = match args.topology.as_deref() {
        None => Vec::new(),
        Some(t) => {
            let spec = match t {
                "six_switch" => TopologySpec::SixSwitch,
                "bw_mesh" => TopologySpec::BwMesh {
                    reference_mbps: None,
                },
                other => return Err(format!("unknown topology {other:?}").into()),
            };
            let declared = spec.declare();
            declared.apply_to(&mut cfg);
            declared.events()
        }
    };

    let controller = Controller::new(cfg.clone())?;
    let (tx, rx) = mpsc::channel::<Inbox>();

    for ev in preload {
        tx.send(Inbox::Control(ev))
            .map_err(|_| "event channel closed")?;
    }

    let mut dispatcher = Dispatcher::new(controller, rx, JsonLinesSink::new(std::io::stdout()))
        .with_tick(Duration::from_millis(args.tick_ms));
    if cfg.probe.enabled {
        if let Some(command) = cfg.probe.command.clone() {
            let tool = Arc::new(CommandTool::new(command, cfg.probe.host_names.clone()));
            let prober = ProberHandle::spawn(tool, tx.clone())?;
            dispatcher = dispatcher.with_prober(prober);
            info!("📶 带宽测量已启用");
        }
    }

    // 读线程可能阻塞在标准输入上，不等待它退出。
    let reader_tx = tx.clone();
    thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for (lineno, line) in stdin.lock().lines().enumerate() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        warn!(error = %e, "读取标准输入失败");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ControlEvent>(&line) {
                    Ok(ev) => {
                        if reader_tx.send(Inbox::Control(ev)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(line = lineno + 1, error = %e, "无法解析的事件，丢弃"),
                }
            }
            let _ = reader_tx.send(Inbox::Shutdown);
        })?;
    drop(tx);

    let outcome = dispatcher.run();

    let stats = &outcome.controller.stats;
    info!(
        events = stats.events,
        dropped = stats.dropped,
        sweeps = outcome.stats.sweeps_submitted,
        abandoned = outcome.stats.sweeps_abandoned,
        divergences = stats.route_divergences,
        "控制器退出"
    );
    Ok(())
}
