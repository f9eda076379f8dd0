//! TulaCalib - calibration bench controller
//!
//! ```text
//! tula-calib [--config tula.toml] run scan.json [--mode raw|average] [--samples N] [--simulate]
//! tula-calib home [--simulate]
//! tula-calib monitor [--seconds 10] [--simulate]
//! ```
//!
//! While a command runs, stdin accepts `p` (pause), `r` (resume) and `s`
//! (emergency stop). Ctrl-C cancels.

use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tula_calib::config::AppConfig;
use tula_calib::devices::SimulatedBench;
use tula_calib::error::{Error, Result};
use tula_calib::ingest::{AccelReader, IngestStats};
use tula_calib::motion::{Actuator, LineActuator};
use tula_calib::transport::{SerialTransport, TcpTransport, Transport};
use tula_calib::{
    AttitudeEstimator, RunControl, SamplingMode, SequencePlan, SequenceRunner, SharedAttitude,
};

/// Used when `--config` is not given and this file exists
const DEFAULT_CONFIG: &str = "tula.toml";

/// Monitor log interval
const MONITOR_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "tula-calib", version, about = "Two-axis accelerometer calibration bench")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a sweep plan and save the dataset
    Run {
        /// Plan file (JSON with a `sequence` list)
        plan: PathBuf,

        /// Override the configured sampling mode
        #[arg(long, value_enum)]
        mode: Option<SamplingMode>,

        /// Override the configured samples per point
        #[arg(long)]
        samples: Option<usize>,

        /// Use the simulated bench instead of hardware
        #[arg(long)]
        simulate: bool,
    },

    /// Drive psi then theta to 0°
    Home {
        #[arg(long)]
        simulate: bool,
    },

    /// Log the live attitude
    Monitor {
        /// Stop after this many seconds
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,

        #[arg(long)]
        simulate: bool,
    },
}

impl Command {
    fn simulate(&self) -> bool {
        match self {
            Command::Run { simulate, .. }
            | Command::Home { simulate }
            | Command::Monitor { simulate, .. } => *simulate,
        }
    }
}

/// Connected bench endpoints
struct Bench {
    accel: Box<dyn Transport>,
    actuator: Box<dyn Actuator>,
    /// Keeps the simulation thread alive
    _sim: Option<SimulatedBench>,
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path),
        None if Path::new(DEFAULT_CONFIG).exists() => AppConfig::from_file(DEFAULT_CONFIG),
        None => Ok(AppConfig::default()),
    }
}

fn connect(config: &AppConfig, simulate: bool) -> Result<Bench> {
    let read_timeout = config.hardware.read_timeout();

    if simulate {
        let (sim, accel, motors) = SimulatedBench::spawn(
            &config.simulation,
            &config.sensor,
            &config.control,
            read_timeout,
        )?;
        return Ok(Bench {
            accel: Box::new(accel),
            actuator: Box::new(LineActuator::new(motors)),
            _sim: Some(sim),
        });
    }

    let accel = TcpTransport::connect(&config.hardware.accel_address, read_timeout)?;
    let motors = SerialTransport::open(&config.hardware)?;
    Ok(Bench {
        accel: Box::new(accel),
        actuator: Box::new(LineActuator::new(motors)),
        _sim: None,
    })
}

/// Operator console on stdin: `p` pause, `r` resume, `s` emergency stop
fn spawn_console(run: Arc<RunControl>) -> Result<()> {
    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match line.trim() {
                    "p" => run.pause(),
                    "r" => run.resume(),
                    "s" => run.emergency_stop(),
                    "" => {}
                    other => log::warn!("Unknown console command {:?} (p/r/s)", other),
                }
                if !run.is_running() {
                    break;
                }
            }
        })
        .map_err(|e| Error::Other(format!("Failed to spawn console: {}", e)))?;
    Ok(())
}

fn stop_reader(run: &RunControl, reader: JoinHandle<IngestStats>) {
    run.cancel();
    match reader.join() {
        Ok(stats) => log::debug!("Ingestion stats: {:?}", stats),
        Err(_) => log::error!("Accelerometer reader panicked"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();

    log::info!("TulaCalib v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Command::Run { mode, samples, .. } = &args.command {
        if let Some(mode) = mode {
            config.sampling.mode = *mode;
        }
        if let Some(samples) = samples {
            config.sampling.samples = *samples;
        }
        config.validate()?;
    }

    // Load the plan before touching hardware
    let plan = match &args.command {
        Command::Run { plan, .. } => Some(SequencePlan::load(plan)?),
        _ => None,
    };

    let run = Arc::new(RunControl::new());
    let attitude = Arc::new(SharedAttitude::new());

    let r = Arc::clone(&run);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.cancel();
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let bench = connect(&config, args.command.simulate())?;
    let reader = AccelReader::new(
        bench.accel,
        &config.sensor.tag,
        AttitudeEstimator::new(config.sensor.sensitivity),
        Arc::clone(&attitude),
        Arc::clone(&run),
    )
    .spawn()?;

    let result = match args.command {
        Command::Monitor { seconds, .. } => {
            monitor(&attitude, &run, Duration::from_secs_f64(seconds.max(0.0)));
            Ok(())
        }
        Command::Home { .. } => {
            spawn_console(Arc::clone(&run))?;
            let mut runner = SequenceRunner::new(
                &config,
                Arc::clone(&attitude),
                Arc::clone(&run),
                bench.actuator,
            );
            if runner.home() {
                log::info!("Bench homed");
            } else {
                log::error!("Homing failed");
            }
            final_stop(runner.into_actuator());
            Ok(())
        }
        Command::Run { .. } => {
            spawn_console(Arc::clone(&run))?;
            let mut runner = SequenceRunner::new(
                &config,
                Arc::clone(&attitude),
                Arc::clone(&run),
                bench.actuator,
            );
            let plan = plan.unwrap_or_default();
            let outcome = runner.run(&plan, &mut |percent| log::info!("Progress: {}%", percent));
            final_stop(runner.into_actuator());
            outcome.map(|report| match report.artifact {
                Some(path) if report.completed => {
                    log::info!("Scan complete: {} rows in {}", report.rows, path.display())
                }
                Some(path) => log::warn!(
                    "Scan incomplete: {} rows saved to {}",
                    report.rows,
                    path.display()
                ),
                None => log::warn!("Scan produced no data"),
            })
        }
    };

    stop_reader(&run, reader);
    log::info!("TulaCalib stopped");
    result
}

fn final_stop(mut actuator: Box<dyn Actuator>) {
    if let Err(e) = actuator.stop_all() {
        log::error!("Final stop-all failed: {}", e);
    }
}

fn monitor(attitude: &SharedAttitude, run: &RunControl, duration: Duration) {
    let started = Instant::now();
    let mut last_ts = None;
    while run.is_running() && started.elapsed() < duration {
        match attitude.latest() {
            Some(sample) if Some(sample.timestamp_us) != last_ts => {
                log::info!(
                    "theta {:+7.2}°  psi {:+8.2}°  raw [{}, {}, {}]",
                    sample.theta,
                    sample.psi,
                    sample.raw[0],
                    sample.raw[1],
                    sample.raw[2]
                );
                last_ts = Some(sample.timestamp_us);
            }
            Some(_) => log::warn!("No new accelerometer data"),
            None => log::info!("Waiting for accelerometer data..."),
        }
        thread::sleep(MONITOR_INTERVAL);
    }
}
