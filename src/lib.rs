//! Battery state-of-charge tracking with an Extended Kalman Filter.
//!
//! The filter runs over a 2-state equivalent-circuit cell model
//! (x = [SOC, V1]) fed by one (current, voltage, temperature) sample per
//! fixed timestep. Characterized cell tables, noise covariances, and initial
//! conditions all arrive through [`SocEkfConfig`], so independently
//! configured estimators (different cell chemistries) can coexist, one per
//! cell/stream.
//!
//! - [`matrix`] — small dense-matrix arithmetic the filter's covariance
//!   bookkeeping is written in
//! - [`cell_model`] — immutable characterization tables with piecewise-linear
//!   lookup
//! - [`estimator`] — the predict/correct recursion itself
//! - [`signals`] — CSV sample input / results output for the driver binary

pub mod cell_model;
pub mod estimator;
pub mod matrix;
pub mod signals;

pub use cell_model::{CellModel, CellModelError};
pub use estimator::{EstimatorError, SocEkf, SocEkfConfig, SocEstimate};
pub use matrix::Matrix;
