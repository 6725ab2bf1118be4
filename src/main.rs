//! venus-sim entry point: CLI wiring, status logging and CSV export.

use std::path::Path;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use venus_sim::cli::{self, CliOptions};
use venus_sim::io::export::export_csv;
use venus_sim::{BatterySimulator, SimError, SimulatorConfig, Snapshot};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves the config source (`--config`, `--preset`, else baseline) and applies overrides.
fn load_config(cli: &CliOptions) -> Result<SimulatorConfig> {
    let mut config = if let Some(ref path) = cli.config {
        SimulatorConfig::from_toml_file(path)?
    } else if let Some(ref name) = cli.preset {
        SimulatorConfig::from_preset(name)?
    } else {
        SimulatorConfig::baseline()
    };

    if let Some(soc) = cli.soc {
        config.battery.initial_soc = soc;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(SimError::InvalidConfig(errors).into());
    }
    Ok(config)
}

/// Polls the running simulator every `every` until `run_for` elapses.
fn sample_blocking(sim: &BatterySimulator, every: Duration, run_for: Duration) -> Vec<Snapshot> {
    let started = Instant::now();
    let mut samples = vec![sim.get_state()];
    loop {
        let elapsed = started.elapsed();
        if elapsed >= run_for {
            break;
        }
        thread::sleep(every.min(run_for - elapsed));
        let snapshot = sim.get_state();
        info!("{snapshot}");
        samples.push(snapshot);
    }
    samples
}

#[cfg(feature = "api")]
fn serve_and_sample(
    sim: &Arc<BatterySimulator>,
    cli: &CliOptions,
    every: Duration,
) -> Result<Vec<Snapshot>> {
    use std::net::SocketAddr;

    use tokio::sync::oneshot;
    use tracing::warn;

    let rt = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;
    rt.block_on(async {
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut server = tokio::spawn(venus_sim::api::serve(Arc::clone(sim), addr, async move {
            // a dropped sender also means shut down
            let _ = stop_rx.await;
        }));

        let deadline = cli
            .run_for_secs()
            .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        let mut samples = vec![sim.get_state()];

        let early_exit = loop {
            let until_deadline = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = sim.get_state();
                    info!("{snapshot}");
                    samples.push(snapshot);
                }
                () = until_deadline => break None,
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        warn!(error = %e, "failed to listen for Ctrl-C");
                    }
                    info!("interrupted, shutting down");
                    break None;
                }
                finished = &mut server => break Some(finished),
            }
        };

        let finished = match early_exit {
            Some(finished) => finished,
            None => {
                let _ = stop_tx.send(());
                server.await
            }
        };
        finished
            .context("API server task panicked")?
            .context("API server failed")?;
        Ok(samples)
    })
}

#[cfg(not(feature = "api"))]
fn serve_and_sample(
    _sim: &Arc<BatterySimulator>,
    _cli: &CliOptions,
    _every: Duration,
) -> Result<Vec<Snapshot>> {
    anyhow::bail!("--serve requires a build with the `api` feature")
}

fn run(cli: &CliOptions) -> Result<()> {
    let config = load_config(cli)?;
    let every = Duration::from_secs(cli.status_every_secs);

    let sim = Arc::new(BatterySimulator::new(&config)?);
    sim.start()?;
    let active = sim.config();
    info!(
        soc = active.battery.initial_soc,
        capacity_wh = active.battery.capacity_wh,
        pv_peak_w = active.pv.peak_w,
        "venus-sim running"
    );

    let sampled = if cli.serve {
        serve_and_sample(&sim, cli, every)
    } else {
        let run_for = Duration::from_secs(cli.run_for_secs().unwrap_or(cli::DEFAULT_DURATION_SECS));
        Ok(sample_blocking(&sim, every, run_for))
    };
    sim.stop()?;
    let samples = sampled?;

    let last = sim.get_state();
    info!("final: {last}");

    if let Some(ref path) = cli.telemetry_out {
        export_csv(&samples, Path::new(path))
            .with_context(|| format!("failed to write CSV to {}", path.display()))?;
        info!(rows = samples.len(), path = %path.display(), "telemetry written");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = match cli::parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(2);
        }
    };
    if cli.help {
        cli::print_usage();
        return Ok(());
    }
    init_tracing();
    run(&cli)
}
