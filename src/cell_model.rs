//! Equivalent-circuit cell characterization
//!
//! Holds the pre-characterized parameter tables of a single cell: open-circuit
//! voltage V0, ohmic resistance R0, polarization resistance R1 and polarization
//! time constant tau1, each sampled at a shared set of SOC breakpoints. The
//! dV0/dSOC slope table needed by the measurement Jacobian is derived at
//! construction. Tables are immutable after construction.

use std::fmt;

/// Errors raised while building a [`CellModel`] from raw tables.
#[derive(Debug, Clone, PartialEq)]
pub enum CellModelError {
    /// A parameter table's length differs from the SOC breakpoint count.
    LengthMismatch {
        table: &'static str,
        expected: usize,
        got: usize,
    },
    /// Fewer than two SOC breakpoints — nothing to interpolate between.
    TooFewBreakpoints { got: usize },
    /// SOC breakpoints must be strictly increasing; `index` is the first
    /// offender.
    BreakpointsNotIncreasing { index: usize },
}

impl fmt::Display for CellModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellModelError::LengthMismatch {
                table,
                expected,
                got,
            } => write!(
                f,
                "{} table has {} entries, expected {} (one per SOC breakpoint)",
                table, got, expected
            ),
            CellModelError::TooFewBreakpoints { got } => {
                write!(f, "need at least 2 SOC breakpoints, got {}", got)
            }
            CellModelError::BreakpointsNotIncreasing { index } => {
                write!(
                    f,
                    "SOC breakpoints must be strictly increasing (violated at index {})",
                    index
                )
            }
        }
    }
}

impl std::error::Error for CellModelError {}

/// Characterized parameter tables for one cell chemistry.
///
/// Lookups interpolate linearly between breakpoints and extrapolate linearly
/// from the boundary segment when queried outside the characterized SOC range.
#[derive(Clone, Debug)]
pub struct CellModel {
    /// SOC breakpoint axis, strictly increasing fractions covering [0, 1].
    soc_breakpoints: Vec<f32>,
    /// Temperature breakpoint axis [K]. A single entry in this revision; kept
    /// as an axis so multi-temperature tables can slot in later.
    temperature_breakpoints_k: Vec<f32>,
    /// Open-circuit voltage V0(SOC) [V]
    ocv_v: Vec<f32>,
    /// Ohmic (terminal) resistance R0(SOC) [ohm]
    r0_ohm: Vec<f32>,
    /// Polarization resistance R1(SOC) [ohm]
    r1_ohm: Vec<f32>,
    /// Polarization time constant tau1(SOC) [s]
    tau1_s: Vec<f32>,
    /// Derived dV0/dSOC slope between consecutive breakpoints; entry 0 is 0
    /// by convention.
    dv_dsoc: Vec<f32>,
}

impl CellModel {
    /// Build a model from raw characterization tables.
    ///
    /// All parameter tables must have one entry per SOC breakpoint, and the
    /// breakpoints must be strictly increasing. Validating monotonicity here
    /// keeps degenerate interpolation denominators out of the per-step path.
    pub fn new(
        soc_breakpoints: Vec<f32>,
        temperature_breakpoints_k: Vec<f32>,
        ocv_v: Vec<f32>,
        r0_ohm: Vec<f32>,
        r1_ohm: Vec<f32>,
        tau1_s: Vec<f32>,
    ) -> Result<Self, CellModelError> {
        let n = soc_breakpoints.len();
        if n < 2 {
            return Err(CellModelError::TooFewBreakpoints { got: n });
        }
        for (table, len) in [
            ("V0", ocv_v.len()),
            ("R0", r0_ohm.len()),
            ("R1", r1_ohm.len()),
            ("tau1", tau1_s.len()),
        ] {
            if len != n {
                return Err(CellModelError::LengthMismatch {
                    table,
                    expected: n,
                    got: len,
                });
            }
        }
        for i in 1..n {
            if soc_breakpoints[i] <= soc_breakpoints[i - 1] {
                return Err(CellModelError::BreakpointsNotIncreasing { index: i });
            }
        }

        let mut dv_dsoc = vec![0.0; n];
        for i in 1..n {
            let delta_soc = soc_breakpoints[i] - soc_breakpoints[i - 1];
            let delta_v = ocv_v[i] - ocv_v[i - 1];
            dv_dsoc[i] = delta_v / delta_soc;
        }

        Ok(Self {
            soc_breakpoints,
            temperature_breakpoints_k,
            ocv_v,
            r0_ohm,
            r1_ohm,
            tau1_s,
            dv_dsoc,
        })
    }

    /// Open-circuit voltage at `soc` [V].
    pub fn ocv(&self, soc: f32) -> f32 {
        self.piecewise(&self.ocv_v, soc)
    }

    /// Ohmic resistance at `soc` [ohm].
    pub fn r0(&self, soc: f32) -> f32 {
        self.piecewise(&self.r0_ohm, soc)
    }

    /// Polarization resistance at `soc` [ohm].
    pub fn r1(&self, soc: f32) -> f32 {
        self.piecewise(&self.r1_ohm, soc)
    }

    /// Polarization time constant at `soc` [s].
    pub fn tau1(&self, soc: f32) -> f32 {
        self.piecewise(&self.tau1_s, soc)
    }

    /// dV0/dSOC slope at `soc` [V per SOC fraction].
    pub fn dv_dsoc(&self, soc: f32) -> f32 {
        self.piecewise(&self.dv_dsoc, soc)
    }

    /// The SOC breakpoint axis.
    pub fn soc_breakpoints(&self) -> &[f32] {
        &self.soc_breakpoints
    }

    /// The temperature breakpoint axis [K].
    pub fn temperature_breakpoints_k(&self) -> &[f32] {
        &self.temperature_breakpoints_k
    }

    /// Whether `soc` lies inside the characterized breakpoint range.
    pub fn covers(&self, soc: f32) -> bool {
        soc >= self.soc_breakpoints[0] && soc <= self.soc_breakpoints[self.soc_breakpoints.len() - 1]
    }

    /// Piecewise-linear lookup of `table` (parallel to the SOC axis) at `soc`.
    ///
    /// Queries outside the breakpoint range ride the slope of the nearest
    /// boundary segment instead of clamping.
    fn piecewise(&self, table: &[f32], soc: f32) -> f32 {
        let bp = &self.soc_breakpoints;
        let mut high = bp.len() - 1;
        for (i, &b) in bp.iter().enumerate().skip(1) {
            if soc < b {
                high = i;
                break;
            }
        }
        let low = high - 1;
        let p = (soc - bp[low]) / (bp[high] - bp[low]);
        table[low] + p * (table[high] - table[low])
    }
}

impl Default for CellModel {
    /// Reference characterization: a 27 Ah cell sampled at 7 SOC breakpoints
    /// and a single 300 K temperature breakpoint.
    fn default() -> Self {
        // new() cannot fail on these fixed tables
        Self::new(
            vec![0.0, 0.1, 0.25, 0.5, 0.75, 0.9, 1.0],
            vec![300.0],
            vec![3.5, 3.57, 3.63, 3.71, 3.93, 4.08, 4.19],
            vec![0.0085, 0.0085, 0.0087, 0.0082, 0.0083, 0.0085, 0.0085],
            vec![0.0029, 0.0024, 0.0026, 0.0016, 0.0023, 0.0018, 0.0017],
            vec![36.0, 45.0, 105.0, 29.0, 77.0, 33.0, 39.0],
        )
        .unwrap_or_else(|e| unreachable!("reference tables are valid: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_at_breakpoints() {
        let cell = CellModel::default();
        let bps = cell.soc_breakpoints().to_vec();
        let expected = [3.5, 3.57, 3.63, 3.71, 3.93, 4.08, 4.19];
        for (i, &bp) in bps.iter().enumerate().skip(1) {
            assert_relative_eq!(cell.ocv(bp), expected[i], max_relative = 1e-6);
        }
    }

    #[test]
    fn test_affine_between_breakpoints() {
        let cell = CellModel::default();
        // Midpoint of the [0.0, 0.1] segment
        assert_relative_eq!(cell.ocv(0.05), (3.5 + 3.57) / 2.0, max_relative = 1e-6);
        // Quarter of the way through [0.5, 0.75]
        assert_relative_eq!(
            cell.ocv(0.5625),
            3.71 + 0.25 * (3.93 - 3.71),
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_extrapolates_past_last_breakpoint() {
        let cell = CellModel::default();
        // Last segment slope: (4.19 - 4.08) / (1.0 - 0.9)
        assert_relative_eq!(cell.ocv(1.1), 4.08 + 2.0 * (4.19 - 4.08), max_relative = 1e-5);
        assert!(!cell.covers(1.1));
    }

    #[test]
    fn test_extrapolates_below_first_breakpoint() {
        let cell = CellModel::default();
        // First segment slope: (3.57 - 3.5) / 0.1
        assert_relative_eq!(cell.ocv(-0.05), 3.5 - 0.5 * (3.57 - 3.5), max_relative = 1e-5);
    }

    #[test]
    fn test_dv_dsoc_first_entry_zero() {
        let cell = CellModel::default();
        // Queries in the first segment blend toward entry 1's slope; the
        // stored slope at breakpoint 0 itself is zero by convention.
        assert_relative_eq!(cell.dv_dsoc(0.0), 0.0);
        let slope_1 = (3.57 - 3.5) / 0.1;
        assert_relative_eq!(cell.dv_dsoc(0.1), slope_1, max_relative = 1e-5);
    }

    #[test]
    fn test_rejects_too_few_breakpoints() {
        let err = CellModel::new(
            vec![0.5],
            vec![300.0],
            vec![3.7],
            vec![0.008],
            vec![0.002],
            vec![40.0],
        )
        .unwrap_err();
        assert_eq!(err, CellModelError::TooFewBreakpoints { got: 1 });
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = CellModel::new(
            vec![0.0, 0.5, 1.0],
            vec![300.0],
            vec![3.5, 3.7, 4.2],
            vec![0.008, 0.008],
            vec![0.002, 0.002, 0.002],
            vec![40.0, 40.0, 40.0],
        )
        .unwrap_err();
        assert!(matches!(err, CellModelError::LengthMismatch { table: "R0", .. }));
    }

    #[test]
    fn test_rejects_non_increasing_breakpoints() {
        let err = CellModel::new(
            vec![0.0, 0.5, 0.5, 1.0],
            vec![300.0],
            vec![3.5, 3.7, 3.8, 4.2],
            vec![0.008; 4],
            vec![0.002; 4],
            vec![40.0; 4],
        )
        .unwrap_err();
        assert_eq!(err, CellModelError::BreakpointsNotIncreasing { index: 2 });
    }
}
