//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! The system is kept purely nodal: `Gx = I` where `x` is the vector of
//! node voltages, ground included as index 0. Every source — independent,
//! behavioural, VCVS, op-amp — is modelled as a Norton equivalent, so no
//! auxiliary branch-current unknowns are ever introduced; row/column 0 is
//! pinned (`G[0,0] = 1`, `I[0] = 0`) after every device has stamped.

mod analysis;
mod mna;
mod newton;
mod simulator;

pub use analysis::{operating_point, output_impedance};
pub use mna::MnaMatrix;
pub use newton::NewtonRaphson;
pub use simulator::{Simulator, SimulatorConfig};

/// Convergence tolerance for Newton-Raphson iteration (compared against the
/// squared L2 norm of the iterate step).
pub const CONVERGENCE_TOLERANCE: f64 = 1e-6;

/// Maximum Newton-Raphson iterations per time step.
pub const MAX_ITERATIONS: usize = 50;

/// Minimum conductance to prevent a floating node from leaving the matrix
/// numerically singular.
pub const MIN_CONDUCTANCE: f64 = 1e-12;
