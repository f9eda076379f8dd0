//! Full-stack scan against the simulated bench: simulator, ingestion loop,
//! line actuator, controller, sampler and runner wired as the binary does.

use approx::assert_abs_diff_eq;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tula_calib::config::AppConfig;
use tula_calib::devices::SimulatedBench;
use tula_calib::ingest::AccelReader;
use tula_calib::motion::LineActuator;
use tula_calib::sampling::SamplingMode;
use tula_calib::sequence::{SequencePlan, SequenceRunner, Step};
use tula_calib::{AttitudeEstimator, RunControl, SharedAttitude};

fn sim_config(output_dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.simulation.rate_hz = 500.0;
    config.simulation.deg_per_speed_unit = 5.0;
    config.simulation.noise_lsb = 0.0;
    config.simulation.seed = 7;
    config.control.period_ms = 10;
    config.control.timeout_s = 10.0;
    config.control.settle_ms = 20;
    config.sampling.mode = SamplingMode::Average;
    config.sampling.samples = 5;
    config.sequence.output_dir = output_dir.to_path_buf();
    config
}

#[test]
fn test_scan_on_simulated_bench() {
    let dir = tempfile::tempdir().unwrap();
    let config = sim_config(dir.path());
    let run = Arc::new(RunControl::new());
    let attitude = Arc::new(SharedAttitude::new());

    let (bench, accel, motors) = SimulatedBench::spawn(
        &config.simulation,
        &config.sensor,
        &config.control,
        Duration::from_millis(50),
    )
    .unwrap();
    let reader = AccelReader::new(
        accel,
        &config.sensor.tag,
        AttitudeEstimator::new(config.sensor.sensitivity),
        Arc::clone(&attitude),
        Arc::clone(&run),
    )
    .spawn()
    .unwrap();

    let plan = SequencePlan::new(vec![Step::new(5.0, vec![0.0, 20.0])]);
    let mut runner = SequenceRunner::new(
        &config,
        Arc::clone(&attitude),
        Arc::clone(&run),
        LineActuator::new(motors),
    );
    let mut progress = Vec::new();
    let report = runner.run(&plan, &mut |p| progress.push(p)).unwrap();

    run.cancel();
    let stats = reader.join().unwrap();

    assert!(report.completed);
    assert_eq!(report.rows, 2);
    assert_eq!(progress, vec![50, 100, 100]);
    assert!(stats.published > 0);
    assert_eq!(stats.discarded, 0);

    let text = fs::read_to_string(report.artifact.unwrap()).unwrap();
    let rows: Vec<Vec<f64>> = text
        .lines()
        .skip(1)
        .map(|l| l.split(',').skip(1).map(|v| v.parse().unwrap()).collect())
        .collect();
    assert_eq!(rows.len(), 2);
    for (row, psi_target) in rows.iter().zip([0.0, 20.0]) {
        assert_eq!(row[0], 5.0);
        assert_abs_diff_eq!(row[1], 5.0, epsilon = 1.5);
        assert_abs_diff_eq!(row[2], psi_target, epsilon = 1.5);
        assert_abs_diff_eq!(row[6], 1.0, epsilon = 1e-3);
    }

    // Returned home and motors stopped
    let pose = bench.pose();
    assert_abs_diff_eq!(pose.theta, 0.0, epsilon = 1.5);
    assert_abs_diff_eq!(pose.psi, 0.0, epsilon = 1.5);
    assert_eq!((pose.theta_speed, pose.psi_speed), (0, 0));
}
