//! Signal file I/O
//!
//! Reads recorded (current, voltage, temperature, reference-SOC) samples from
//! a headered CSV file and writes per-step estimation results back out. The
//! reference-SOC column is ground truth for comparison/plotting only — it is
//! never fed to the filter.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

/// One recorded sample, in model units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalRecord {
    /// Measured current [A], positive = discharge
    pub current_a: f32,
    /// Measured terminal voltage [V]
    pub voltage_v: f32,
    /// Measured temperature [K]
    pub temperature_k: f32,
    /// Reference SOC [fraction], comparison only
    pub soc_ref: f32,
}

/// Per-step estimator output destined for the results file.
#[derive(Clone, Copy, Debug)]
pub struct EstimateRecord {
    /// SOC estimate before the step consumed the sample [fraction]
    pub soc_estimate: f32,
    /// Predicted SOC after the step [fraction]
    pub predicted_soc: f32,
    /// Predicted polarization voltage after the step [V]
    pub predicted_polarization_v: f32,
}

/// Read all samples from a `Current,Voltage,Temperature,SOC` CSV file.
///
/// The first line is treated as a header and skipped. Trailing columns beyond
/// the four the model consumes are ignored.
pub fn read_signals(path: &Path) -> Result<Vec<SignalRecord>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if idx == 0 || line.trim().is_empty() {
            continue;
        }
        let record = parse_line(&line)
            .with_context(|| format!("{}:{}: bad sample row", path.display(), idx + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn parse_line(line: &str) -> Result<SignalRecord> {
    let mut fields = line.split(',');
    let mut next_f32 = |name: &str| -> Result<f32> {
        let raw = match fields.next() {
            Some(raw) => raw.trim(),
            None => bail!("missing {} column", name),
        };
        raw.parse::<f32>()
            .with_context(|| format!("{} column is not a number: {:?}", name, raw))
    };

    Ok(SignalRecord {
        current_a: next_f32("current")?,
        voltage_v: next_f32("voltage")?,
        temperature_k: next_f32("temperature")?,
        soc_ref: next_f32("SOC")?,
    })
}

/// Write the input samples alongside the per-step estimates.
///
/// `estimates` must be parallel to `records` (one estimate captured per
/// consumed sample).
pub fn write_estimates(
    path: &Path,
    records: &[SignalRecord],
    estimates: &[EstimateRecord],
) -> Result<()> {
    if records.len() != estimates.len() {
        bail!(
            "have {} samples but {} estimates",
            records.len(),
            estimates.len()
        );
    }

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(
        out,
        "Current,Voltage,Temperature,SOC,SOC_Estimate,SOC_Predicted,V1_Predicted"
    )?;
    for (r, e) in records.iter().zip(estimates.iter()) {
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            r.current_a,
            r.voltage_v,
            r.temperature_k,
            r.soc_ref,
            e.soc_estimate,
            e.predicted_soc,
            e.predicted_polarization_v,
        )?;
    }
    out.flush().with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
