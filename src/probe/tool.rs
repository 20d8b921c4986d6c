//! 吞吐测量工具
//!
//! 测量由外部进程完成（测试床里是在客户端主机上运行 `iperf -c <server_ip>`），
//! 这里只负责拼装命令、限时等待、在取消时终止进程，以及从输出中解析 Mbps。

use std::collections::BTreeMap;
use std::io::Read;
use std::net::IpAddr;
use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, trace};

use super::error::ProbeError;
use super::worker::CancelToken;
use crate::config::CommandSpec;
use crate::net::MacAddr;

/// 一次测量：在 `client` 上向 `server`（`server_ip`）发起吞吐测试，数据方向 client -> server。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureRequest {
    pub server: MacAddr,
    pub server_ip: IpAddr,
    pub client: MacAddr,
    pub client_ip: Option<IpAddr>,
}

/// 外部测量工具
pub trait ThroughputTool: Send + Sync {
    /// 返回测得的吞吐（Mbps）。实现应当在 `cancel` 被触发后尽快返回 `ProbeError::Cancelled`。
    fn measure(&self, req: &MeasureRequest, cancel: &CancelToken) -> Result<f64, ProbeError>;
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// 通过子进程运行测量命令
#[derive(Debug, Clone)]
pub struct CommandTool {
    spec: CommandSpec,
    host_names: BTreeMap<MacAddr, String>,
}

impl CommandTool {
    pub fn new(spec: CommandSpec, host_names: BTreeMap<MacAddr, String>) -> Self {
        Self { spec, host_names }
    }

    /// 主机名：优先使用配置映射，否则按测试床约定用 IPv4 末字节生成 `h<N>`。
    fn host_name(&self, mac: MacAddr, ip: Option<IpAddr>) -> Result<String, ProbeError> {
        if let Some(name) = self.host_names.get(&mac) {
            return Ok(name.clone());
        }
        match ip {
            Some(IpAddr::V4(v4)) => Ok(format!("h{}", v4.octets()[3])),
            _ => Err(ProbeError::UnknownHost(mac)),
        }
    }

    /// 替换参数模板中的占位符
    pub fn render_args(&self, req: &MeasureRequest) -> Result<Vec<String>, ProbeError> {
        let needs = |key: &str| self.spec.args.iter().any(|a| a.contains(key));

        let client = if needs("{client}") {
            self.host_name(req.client, req.client_ip)?
        } else {
            String::new()
        };
        let server = if needs("{server}") {
            self.host_name(req.server, Some(req.server_ip))?
        } else {
            String::new()
        };
        let client_ip = match req.client_ip {
            Some(ip) => ip.to_string(),
            None if needs("{client_ip}") => return Err(ProbeError::MissingAddress(req.client)),
            None => String::new(),
        };
        let server_ip = req.server_ip.to_string();

        Ok(self
            .spec
            .args
            .iter()
            .map(|a| {
                a.replace("{client_ip}", &client_ip)
                    .replace("{server_ip}", &server_ip)
                    .replace("{client}", &client)
                    .replace("{server}", &server)
            })
            .collect())
    }

    /// 本次测量的截止时刻；超出 `Instant` 可表示范围的超时视为配置错误。
    fn deadline(&self) -> Result<Instant, ProbeError> {
        Instant::now()
            .checked_add(Duration::from_secs(self.spec.timeout_secs))
            .ok_or(ProbeError::InvalidTimeout(self.spec.timeout_secs))
    }

    fn wait(
        &self,
        child: &mut Child,
        cancel: &CancelToken,
        deadline: Instant,
    ) -> Result<std::process::ExitStatus, ProbeError> {
        loop {
            if let Some(status) = child.try_wait().map_err(ProbeError::Spawn)? {
                return Ok(status);
            }
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProbeError::Cancelled);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProbeError::Timeout(self.spec.timeout_secs));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// 收集两路输出。进程退出后管道仍可能被其派生的后台进程持有，
    /// 因此这里同样受截止时刻与取消标记约束，未读完的读取线程直接放弃。
    fn collect_output(
        &self,
        rx: &Receiver<(Pipe, String)>,
        cancel: &CancelToken,
        deadline: Instant,
    ) -> Result<(String, String), ProbeError> {
        let mut out = String::new();
        let mut err = String::new();
        loop {
            if cancel.is_cancelled() {
                return Err(ProbeError::Cancelled);
            }
            let slice = POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now()));
            match rx.recv_timeout(slice) {
                Ok((Pipe::Stdout, text)) => out = text,
                Ok((Pipe::Stderr, text)) => err = text,
                Err(RecvTimeoutError::Timeout) if Instant::now() >= deadline => {
                    return Err(ProbeError::Timeout(self.spec.timeout_secs));
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Ok((out, err)),
            }
        }
    }
}

impl ThroughputTool for CommandTool {
    #[tracing::instrument(skip(self, cancel), fields(program = %self.spec.program, client = %req.client, server = %req.server))]
    fn measure(&self, req: &MeasureRequest, cancel: &CancelToken) -> Result<f64, ProbeError> {
        let args = self.render_args(req)?;
        let deadline = self.deadline()?;
        debug!(?args, "📏 启动测量命令");

        let mut child = Command::new(&self.spec.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ProbeError::Spawn)?;

        // 后台读取输出，避免管道写满导致子进程阻塞。
        let (tx, rx) = mpsc::channel();
        if let Some(pipe) = child.stdout.take() {
            spawn_reader(Pipe::Stdout, pipe, tx.clone());
        }
        if let Some(pipe) = child.stderr.take() {
            spawn_reader(Pipe::Stderr, pipe, tx.clone());
        }
        drop(tx);

        let status = self.wait(&mut child, cancel, deadline)?;
        let (out, err) = self.collect_output(&rx, cancel, deadline)?;
        trace!(%status, stdout = %out, stderr = %err, "测量命令结束");

        if !status.success() {
            return Err(ProbeError::ExitStatus {
                code: status.code(),
                stderr: err.trim().to_string(),
            });
        }
        parse_throughput(&out)
    }
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Pipe, mut r: R, tx: Sender<(Pipe, String)>) {
    thread::spawn(move || {
        let mut buf = String::new();
        let _ = r.read_to_string(&mut buf);
        let _ = tx.send((pipe, buf));
    });
}

fn throughput_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*([KMG]?)bits/sec").expect("valid throughput regex")
    })
}

/// 从 iperf 风格的输出中解析吞吐（Mbps）。取最后一个速率（汇总行）。
pub fn parse_throughput(output: &str) -> Result<f64, ProbeError> {
    let caps = throughput_re()
        .captures_iter(output)
        .last()
        .ok_or_else(|| ProbeError::Unparseable(output.trim().to_string()))?;

    let value: f64 = caps[1]
        .parse()
        .map_err(|_| ProbeError::Unparseable(caps[0].to_string()))?;
    let mbps = match &caps[2] {
        "K" => value / 1000.0,
        "G" => value * 1000.0,
        "M" => value,
        _ => value / 1_000_000.0,
    };
    if !mbps.is_finite() || mbps <= 0.0 {
        return Err(ProbeError::Unparseable(caps[0].to_string()));
    }
    Ok(mbps)
}
