use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use soc_tracker_rs::estimator::{SocEkf, SocEkfConfig};
use soc_tracker_rs::signals::{read_signals, write_estimates, EstimateRecord};

#[derive(Parser, Debug)]
#[command(name = "soc_tracker")]
#[command(about = "Battery SOC estimation - EKF over recorded cell signals", long_about = None)]
struct Args {
    /// Input CSV of Current,Voltage,Temperature,SOC samples
    #[arg(long, default_value = "signals.csv")]
    input: PathBuf,

    /// Output CSV with per-step estimates appended
    #[arg(long, default_value = "signals_with_est.csv")]
    output: PathBuf,

    /// Optional JSON run summary
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Initial SOC guess [fraction]
    #[arg(long, default_value = "0.6")]
    initial_soc: f32,

    /// Rated cell capacity [A*hr]
    #[arg(long, default_value = "27.0")]
    capacity_ah: f32,

    /// Sample interval [seconds]
    #[arg(long, default_value = "1.0")]
    sample_time: f32,

    /// Measurement noise variance R [V^2]
    #[arg(long, default_value = "0.7")]
    measurement_noise: f32,

    /// Process noise on the SOC state (Q diagonal, first entry)
    #[arg(long, default_value = "0.000005")]
    q_soc: f32,

    /// Process noise on the polarization state (Q diagonal, second entry)
    #[arg(long, default_value = "0.0004")]
    q_v1: f32,
}

#[derive(Serialize)]
struct RunSummary {
    samples: usize,
    final_soc_estimate: f32,
    final_reference_soc: f32,
    rmse_vs_reference: f32,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("SOC tracker running.");

    let records = read_signals(&args.input)?;
    println!("Loaded {} samples from {}", records.len(), args.input.display());

    let config = SocEkfConfig {
        initial_soc: args.initial_soc,
        capacity_ah: args.capacity_ah,
        sample_time_s: args.sample_time,
        measurement_noise: args.measurement_noise,
        process_noise: [[args.q_soc, 0.0], [0.0, args.q_v1]],
        ..SocEkfConfig::default()
    };
    let mut ekf = SocEkf::new(config);

    let mut estimates = Vec::with_capacity(records.len());
    let mut sq_err_sum = 0.0f64;
    for (idx, sample) in records.iter().enumerate() {
        // The sink wants the estimate as it stood before this sample.
        let soc_before = ekf.soc_estimate();
        ekf.step(sample.current_a, sample.voltage_v, sample.temperature_k)
            .with_context(|| format!("estimator failed on sample {}", idx + 1))?;

        estimates.push(EstimateRecord {
            soc_estimate: soc_before,
            predicted_soc: ekf.predicted_soc(),
            predicted_polarization_v: ekf.predicted_polarization_voltage(),
        });
        sq_err_sum += f64::from(soc_before - sample.soc_ref).powi(2);
    }

    write_estimates(&args.output, &records, &estimates)?;
    println!("Wrote estimates to {}", args.output.display());

    let rmse = if records.is_empty() {
        0.0
    } else {
        (sq_err_sum / records.len() as f64).sqrt() as f32
    };

    if let Some(summary_path) = &args.summary {
        let summary = RunSummary {
            samples: records.len(),
            final_soc_estimate: ekf.soc_estimate(),
            final_reference_soc: records.last().map(|r| r.soc_ref).unwrap_or(0.0),
            rmse_vs_reference: rmse,
        };
        let file = File::create(summary_path)
            .with_context(|| format!("creating {}", summary_path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)?;
        println!("Wrote summary to {}", summary_path.display());
    }

    println!(
        "SOC tracker complete: final estimate {:.4} over {} steps (RMSE vs reference {:.4})",
        ekf.soc_estimate(),
        ekf.steps(),
        rmse
    );
    Ok(())
}
