// estimator.rs — Pure computation layer of the SOC tracker
//
// Everything in this module is independent of file I/O, CLI parsing, and
// reporting. It takes one (current, voltage, temperature) sample per fixed
// timestep and produces an updated SOC / polarization-voltage estimate, so it
// can be unit-tested with synthetic data and driven from recorded CSV logs
// without touching the filter logic.
//
// Model reference: terminal voltage v = V0(SOC) - i*R0(SOC) - V1, with the
// polarization branch V1 following a first-order RC response. The filter is a
// textbook EKF over the 2-state vector x = [SOC, V1]^T.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cell_model::CellModel;
use crate::matrix::Matrix;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Everything the estimator needs to know about one cell and its tuning.
///
/// All constants live here rather than in the estimator type, so estimators
/// for different cell chemistries can coexist, each with its own tables and
/// noise tuning.
#[derive(Clone, Debug)]
pub struct SocEkfConfig {
    /// Characterized parameter tables for the cell.
    pub cell: CellModel,
    /// Rated cell capacity [A*hr]
    pub capacity_ah: f32,
    /// Fixed sample interval Ts [s]. `step` must be called once per interval.
    pub sample_time_s: f32,
    /// Process noise covariance Q, row-major 2x2.
    pub process_noise: [[f32; 2]; 2],
    /// Measurement noise variance R (scalar, terminal voltage) [V^2]
    pub measurement_noise: f32,
    /// Initial state error covariance P0, row-major 2x2.
    pub initial_covariance: [[f32; 2]; 2],
    /// Initial SOC guess handed to the estimator [fraction]
    pub initial_soc: f32,
}

impl Default for SocEkfConfig {
    fn default() -> Self {
        Self {
            cell: CellModel::default(),
            capacity_ah: 27.0,
            sample_time_s: 1.0,
            process_noise: [[0.000005, 0.0], [0.0, 0.0004]],
            measurement_noise: 0.7,
            initial_covariance: [[0.01, 0.0], [0.0, 0.0004]],
            initial_soc: 0.6,
        }
    }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Numerical failures surfaced by [`SocEkf::step`].
///
/// Both indicate a broken tuning or diverged state, not a recoverable
/// condition; downstream charge-control decisions must not consume the
/// estimate once one of these is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorError {
    /// Innovation covariance S collapsed to (near) zero, so no Kalman gain
    /// can be formed. Points at pathological Q/R tuning.
    SingularInnovation { value: f32 },
    /// The corrected state picked up a NaN/Inf component.
    NonFiniteEstimate { soc: f32, polarization_v: f32 },
}

impl fmt::Display for EstimatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatorError::SingularInnovation { value } => {
                write!(f, "innovation covariance is singular (S = {})", value)
            }
            EstimatorError::NonFiniteEstimate { soc, polarization_v } => write!(
                f,
                "state estimate is no longer finite (SOC = {}, V1 = {})",
                soc, polarization_v
            ),
        }
    }
}

impl std::error::Error for EstimatorError {}

// ─── Estimator ───────────────────────────────────────────────────────────────

/// Lifecycle of the filter. The transition happens on the first `step` call,
/// which seeds the polarization-voltage state from the first measurement
/// instead of an arbitrary prior.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    Uninitialized,
    Running,
}

/// Read-only snapshot of the filter, for reporting and persistence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SocEstimate {
    /// Corrected SOC estimate [fraction]
    pub soc: f32,
    /// Corrected polarization-branch voltage V1 [V]
    pub polarization_v: f32,
    /// Predicted (pre-correction) SOC from the last step [fraction]
    pub predicted_soc: f32,
    /// Predicted (pre-correction) V1 from the last step [V]
    pub predicted_polarization_v: f32,
    /// Trace of the error covariance P.
    pub covariance_trace: f32,
    /// Completed `step` calls.
    pub steps: u64,
}

/// Extended Kalman filter over the 2-state equivalent-circuit cell model.
///
/// One instance per cell/stream; `step` mutates internal state and is not
/// safe to share across threads without external synchronization. Each call
/// is O(1) — the filter keeps no history.
pub struct SocEkf {
    config: SocEkfConfig,
    phase: Phase,

    /// Corrected state x = [SOC, V1]^T (2x1)
    x: Matrix,
    /// Predicted state x_hat(k+1|k) (2x1)
    x_pred: Matrix,
    /// Corrected error covariance P (2x2)
    p: Matrix,
    /// Predicted error covariance P(k+1|k) (2x2)
    p_pred: Matrix,
    /// Kalman gain (2x1)
    gain: Matrix,

    /// Process noise as a matrix, built once from the config.
    q: Matrix,

    /// Latched model-sign current [A]; positive charges the cell.
    current_a: f32,
    /// Latched terminal voltage [V]
    voltage_v: f32,
    /// Latched temperature [K]. Accepted but unused until the tables grow a
    /// second temperature breakpoint.
    temperature_k: f32,

    steps: u64,
    range_warned: bool,
}

impl SocEkf {
    pub fn new(config: SocEkfConfig) -> Self {
        let mut x = Matrix::zeros(2, 1);
        x[(0, 0)] = config.initial_soc;

        let mut p = Matrix::zeros(2, 2);
        let mut q = Matrix::zeros(2, 2);
        for i in 0..2 {
            for j in 0..2 {
                p[(i, j)] = config.initial_covariance[i][j];
                q[(i, j)] = config.process_noise[i][j];
            }
        }

        Self {
            config,
            phase: Phase::Uninitialized,
            x,
            x_pred: Matrix::zeros(2, 1),
            p,
            p_pred: Matrix::zeros(2, 2),
            gain: Matrix::zeros(2, 1),
            q,
            current_a: 0.0,
            voltage_v: 0.0,
            temperature_k: 0.0,
            steps: 0,
            range_warned: false,
        }
    }

    /// Advance the filter by one fixed timestep.
    ///
    /// `current_a` uses the measurement sign convention (positive =
    /// discharge); `temperature_k` is latched for forward compatibility but
    /// does not influence lookups in this revision. Call once per
    /// `sample_time_s`, in sample order.
    pub fn step(
        &mut self,
        current_a: f32,
        voltage_v: f32,
        temperature_k: f32,
    ) -> Result<(), EstimatorError> {
        self.latch_inputs(current_a, voltage_v, temperature_k);
        self.predict();
        self.correct()?;
        self.steps += 1;
        Ok(())
    }

    /// Current corrected SOC estimate [fraction].
    pub fn soc_estimate(&self) -> f32 {
        self.x[(0, 0)]
    }

    /// Current corrected polarization voltage V1 [V].
    pub fn polarization_voltage(&self) -> f32 {
        self.x[(1, 0)]
    }

    /// Predicted (pre-correction) SOC from the most recent step [fraction].
    pub fn predicted_soc(&self) -> f32 {
        self.x_pred[(0, 0)]
    }

    /// Predicted (pre-correction) polarization voltage from the most recent
    /// step [V].
    pub fn predicted_polarization_voltage(&self) -> f32 {
        self.x_pred[(1, 0)]
    }

    /// Error covariance P of the corrected state.
    pub fn covariance(&self) -> &Matrix {
        &self.p
    }

    /// Whether the first step has run (polarization state seeded).
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Completed step count.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Temperature latched with the most recent sample [K].
    pub fn latched_temperature_k(&self) -> f32 {
        self.temperature_k
    }

    pub fn config(&self) -> &SocEkfConfig {
        &self.config
    }

    pub fn snapshot(&self) -> SocEstimate {
        SocEstimate {
            soc: self.soc_estimate(),
            polarization_v: self.polarization_voltage(),
            predicted_soc: self.predicted_soc(),
            predicted_polarization_v: self.predicted_polarization_voltage(),
            covariance_trace: self.p[(0, 0)] + self.p[(1, 1)],
            steps: self.steps,
        }
    }

    // ── Input latch ──

    fn latch_inputs(&mut self, current_a: f32, voltage_v: f32, temperature_k: f32) {
        // Model sign convention: positive current charges the cell, so the
        // measured discharge-positive current flips sign here.
        self.current_a = -current_a;
        self.voltage_v = voltage_v;
        self.temperature_k = temperature_k;

        if self.phase == Phase::Uninitialized {
            // Seed V1 algebraically from the first terminal-voltage sample at
            // the configured initial SOC. V1 is unobserved directly, and a
            // zero prior would bias the first corrections.
            let soc0 = self.config.initial_soc;
            let cell = &self.config.cell;
            self.x[(1, 0)] = cell.ocv(soc0) - voltage_v - self.current_a * cell.r0(soc0);
            self.phase = Phase::Running;
        }
    }

    // ── Prediction ──

    fn predict(&mut self) {
        let soc = self.x[(0, 0)];
        let v1 = self.x[(1, 0)];
        let cell = &self.config.cell;
        let ts = self.config.sample_time_s;

        let r1 = cell.r1(soc);
        let tau1 = cell.tau1(soc);
        let a = (-ts / tau1).exp();
        let b = r1 * (1.0 - a);

        // Coulomb counting for SOC, first-order RC decay for V1.
        let mut x_pred = Matrix::zeros(2, 1);
        x_pred[(0, 0)] = soc - self.current_a * ts / (3600.0 * self.config.capacity_ah);
        x_pred[(1, 0)] = a * v1 + b * self.current_a;
        self.x_pred = x_pred;

        // SOC dynamics are linear already; only the polarization branch
        // contributes a non-unit Jacobian term.
        let mut f = Matrix::zeros(2, 2);
        f[(0, 0)] = 1.0;
        f[(1, 1)] = a;

        self.p_pred = (&f * &self.p) * f.transpose() + &self.q;
    }

    // ── Correction ──

    fn correct(&mut self) -> Result<(), EstimatorError> {
        let soc_pred = self.x_pred[(0, 0)];

        // H = [dV0/dSOC, -1], linearized at the predicted state.
        let mut h = Matrix::zeros(1, 2);
        h[(0, 0)] = self.config.cell.dv_dsoc(soc_pred);
        h[(0, 1)] = -1.0;

        let s = ((&h * &self.p_pred) * h.transpose()).scalar() + self.config.measurement_noise;
        if !s.is_finite() || s.abs() <= f32::EPSILON {
            return Err(EstimatorError::SingularInnovation { value: s });
        }

        // S is a scalar, so the gain is a plain division.
        self.gain = (&self.p_pred * h.transpose()) * (1.0 / s);

        let residual = self.voltage_v - self.predicted_terminal_voltage();
        self.x = &self.x_pred + &self.gain * residual;
        self.p = ((&self.gain * &h) * -1.0 + Matrix::identity(2)) * &self.p_pred;

        let soc = self.x[(0, 0)];
        let v1 = self.x[(1, 0)];
        if !soc.is_finite() || !v1.is_finite() {
            return Err(EstimatorError::NonFiniteEstimate {
                soc,
                polarization_v: v1,
            });
        }

        if !self.range_warned && !self.config.cell.covers(soc) {
            log::warn!(
                "SOC estimate {:.4} left the characterized range [{:.2}, {:.2}]; \
                 lookups are extrapolating",
                soc,
                self.config.cell.soc_breakpoints()[0],
                self.config.cell.soc_breakpoints()[self.config.cell.soc_breakpoints().len() - 1],
            );
            self.range_warned = true;
        }

        Ok(())
    }

    /// Measurement function h(x) = V0(SOC) - i*R0(SOC) - V1 evaluated at the
    /// predicted state.
    fn predicted_terminal_voltage(&self) -> f32 {
        let soc = self.x_pred[(0, 0)];
        let cell = &self.config.cell;
        cell.ocv(soc) - self.current_a * cell.r0(soc) - self.x_pred[(1, 0)]
    }
}
