//! 场景回放
//!
//! 把场景文件中的事件按顺序交给控制器，打印产生的转发指令与路径查询结果。

use clap::Parser;
use sdnctl_rs::config::ControllerConfig;
use sdnctl_rs::net::SwitchId;
use sdnctl_rs::scenario::{PathQuery, ScenarioSpec, TopologySpec};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "sdn-replay", about = "Replay a scenario.json through the SDN controller")]
struct Args {
    /// Path to scenario.json
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Controller config (overrides the one embedded in the scenario)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Built-in topology when no scenario is given: six_switch or bw_mesh
    #[arg(long)]
    topology: Option<String>,

    /// Extra path query, e.g. `1:6` (repeatable)
    #[arg(long = "path")]
    paths: Vec<String>,

    /// Print instructions as JSON lines
    #[arg(long)]
    json: bool,

    /// Print the topology report after replay
    #[arg(long)]
    report: bool,
}

fn parse_query(raw: &str) -> Result<PathQuery, String> {
    let (a, b) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected SRC:DST, got {raw:?}"))?;
    let src = a.trim().parse::<u64>().map_err(|e| format!("bad src {a:?}: {e}"))?;
    let dst = b.trim().parse::<u64>().map_err(|e| format!("bad dst {b:?}: {e}"))?;
    Ok(PathQuery {
        src: SwitchId(src),
        dst: SwitchId(dst),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let mut spec = match &args.scenario {
        Some(path) => ScenarioSpec::load(path)?,
        None => ScenarioSpec {
            schema_version: 1,
            config: None,
            topology: None,
            step_ms: 0,
            events: Vec::new(),
            queries: Vec::new(),
        },
    };
    if let Some(t) = &args.topology {
        spec.topology = Some(match t.as_str() {
            "six_switch" => TopologySpec::SixSwitch,
            "bw_mesh" => TopologySpec::BwMesh {
                reference_mbps: None,
            },
            other => return Err(format!("unknown topology {other:?}").into()),
        });
    }
    for raw in &args.paths {
        spec.queries.push(parse_query(raw)?);
    }

    let override_cfg = args
        .config
        .as_deref()
        .map(ControllerConfig::load)
        .transpose()?;
    let replay = spec.replay(override_cfg)?;

    for ins in &replay.instructions {
        if args.json {
            println!("{}", serde_json::to_string(ins)?);
        } else {
            println!("{ins}");
        }
    }

    for (q, result) in &replay.routes {
        match result {
            Ok(path) => {
                let hops: Vec<String> = path.hops.iter().map(|s| s.0.to_string()).collect();
                println!(
                    "path {} -> {}: [{}] cost={}",
                    q.src.0,
                    q.dst.0,
                    hops.join(","),
                    path.cost
                );
            }
            Err(e) => println!("path {} -> {}: none ({e})", q.src.0, q.dst.0),
        }
    }

    if args.report {
        print!("{}", replay.controller.topology().report());
    }

    let stats = &replay.controller.stats;
    println!(
        "done events={} dropped={} instructions={} floods={} flow_installs={}",
        stats.events,
        stats.dropped,
        replay.instructions.len(),
        stats.floods,
        stats.flow_installs
    );
    Ok(())
}
