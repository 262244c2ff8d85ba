use anyhow::Context;
use clap::Parser;
use generator::profile::{SyntheticSonar, SyntheticTelemetry};
use gui_bridge::bridge::{bind_address, GuiBridge, DEFAULT_PORT};
use sonarcore::processing::CfarAlgorithm;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Synthetic sonar front-end driver")]
struct Args {
    /// Run a single sweep and print its summary as JSON
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Stop after this many sweeps (runs until Ctrl+C otherwise)
    #[arg(long)]
    sweeps: Option<u64>,
    /// Seed for the synthetic head and vehicle
    #[arg(long)]
    seed: Option<u64>,
    /// CFAR noise estimator: CA, SOCA, GOCA or OS
    #[arg(long)]
    algorithm: Option<CfarAlgorithm>,
    /// CFAR probability of false alarm
    #[arg(long)]
    pfa: Option<f64>,
    /// Serve the JSON bridge while scanning and keep it up afterwards
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = match &args.workflow {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    }
    .with_overrides(args.seed, args.algorithm, args.pfa);

    let runner = Runner::new(workflow_config)?;
    let gui_bridge = args
        .serve
        .then(|| GuiBridge::new(runner.bridge_state(), bind_address(args.port)));
    if let Some(bridge) = &gui_bridge {
        bridge.publish_status(&format!("HTTP bridge listening on {}", bridge.addr()));
    }

    let sweep_limit = if args.offline { Some(1) } else { args.sweeps };
    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating scan runtime")?;

    let summary = runtime.block_on(async {
        let stop = runner.stop_handle();
        let interrupt = tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                log::info!(target: "simulator", "Ctrl+C received, stopping scan");
                stop.send_replace(true);
            }
        });

        let config = runner.config();
        let device = SyntheticSonar::new(config.generator.clone(), config.mapper.speed_of_sound_m_s);
        let sources = config
            .telemetry
            .sensors
            .iter()
            .map(|&kind| {
                (
                    kind,
                    SyntheticTelemetry::new(config.generator.clone(), kind, runner.epoch()),
                )
            })
            .collect();
        let result = runner.run(device, sources, sweep_limit).await;
        interrupt.abort();
        result
    })?;

    let metrics = summary.metrics;
    println!(
        "Scan finished -> sweeps {}, detections {}, dropped steps {}, telemetry samples {} ({} errors)",
        summary.sweeps,
        metrics.detections,
        metrics.steps_dropped,
        summary.telemetry_samples,
        metrics.telemetry_errors
    );

    if args.offline {
        match &summary.latest {
            Some(latest) => println!(
                "{}",
                serde_json::to_string_pretty(latest).context("encoding sweep summary")?
            ),
            None => println!("No sweep completed."),
        }
    }

    if let Some(bridge) = &gui_bridge {
        bridge.publish_status(&format!(
            "{} sweeps published; bridge still serving (Ctrl+C to stop)...",
            bridge.sweeps_seen()
        ));
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
