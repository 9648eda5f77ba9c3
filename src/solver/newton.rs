//! Newton-Raphson iteration for nonlinear components.
//!
//! Convergence is checked against the squared L2 norm of the per-iteration
//! step. Exhausting the iteration cap is never fatal: the loop keeps the
//! last iterate, every device keeps its last-stamped state, and the
//! simulation carries on into the next sample. A running `failed_count`
//! tracks how often this happens so a caller can decide whether to warn.

use log::warn;

use crate::circuit::Circuit;
use crate::components::Component;

use super::mna::MnaMatrix;
use super::{CONVERGENCE_TOLERANCE, MAX_ITERATIONS};

/// How many non-converged samples must occur before another warning is
/// logged, so a circuit that genuinely never settles doesn't spam the log
/// once per sample.
const WARN_EVERY: u64 = 512;

/// Newton-Raphson solver for nonlinear circuits.
pub struct NewtonRaphson {
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Node voltages at the last converged (or exhausted) sample.
    sample_prev: Vec<f64>,
    /// Node voltages at the previous iterate within the current sample.
    iter_prev: Vec<f64>,
    /// Total samples solved.
    pub sample_count: u64,
    /// Samples that hit the iteration cap without converging.
    pub failed_count: u64,
    /// Sum of iterations spent across all samples (for diagnostics).
    pub total_iterations: u64,
}

impl Default for NewtonRaphson {
    fn default() -> Self {
        Self::new()
    }
}

impl NewtonRaphson {
    pub fn new() -> Self {
        Self::with_config(MAX_ITERATIONS, CONVERGENCE_TOLERANCE)
    }

    pub fn with_config(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
            sample_prev: Vec::new(),
            iter_prev: Vec::new(),
            sample_count: 0,
            failed_count: 0,
            total_iterations: 0,
        }
    }

    /// Advance the circuit by one time step. Returns the number of
    /// iterations actually run (equal to `max_iterations` when the sample
    /// did not converge).
    pub fn solve(&mut self, circuit: &mut Circuit, matrix: &mut MnaMatrix, dt: f64, t: f64) -> usize {
        let size = matrix.size;
        if self.sample_prev.len() != size {
            self.sample_prev = matrix.x.clone();
        }
        if self.iter_prev.len() != size {
            self.iter_prev = vec![0.0; size];
        }

        // Parameter evaluators are a function of time/registry only, not of
        // the node voltages being solved for: run them once per sample.
        for component in &circuit.components {
            if let Component::ParamEvaluator(a) = component {
                a.evaluate(&mut circuit.registry, dt, t);
            }
        }

        // Freeze anything that depends only on the last converged sample,
        // not on the iterate currently being solved for.
        let sample_prev = self.sample_prev.clone();
        for component in &mut circuit.components {
            match component {
                Component::Diode(d) => d.prepare(dt),
                Component::Mosfet(m) => m.prepare(dt),
                Component::Subcircuit(x) => {
                    let v_in = sample_prev[x.input().index()];
                    x.prepare(v_in, dt);
                }
                _ => {}
            }
        }

        let tol_sq = self.tolerance * self.tolerance;
        let mut iterations_used = self.max_iterations;
        let mut converged = false;

        for iter in 0..self.max_iterations {
            self.iter_prev.copy_from_slice(&matrix.x);

            matrix.clear();
            self.stamp_all(circuit, matrix, dt, t);
            matrix.pin_ground();
            matrix.factor();
            matrix.solve();

            let mut err_sq = 0.0;
            for i in 0..size {
                let d = matrix.x[i] - self.iter_prev[i];
                err_sq += d * d;
            }

            if err_sq < tol_sq {
                iterations_used = iter + 1;
                converged = true;
                break;
            }
        }

        self.sample_count += 1;
        self.total_iterations += iterations_used as u64;
        if !converged {
            self.failed_count += 1;
            if self.failed_count % WARN_EVERY == 1 {
                warn!(
                    "Newton-Raphson failed to converge within {} iterations ({} samples so far)",
                    self.max_iterations, self.failed_count
                );
            }
        }

        if converged {
            self.update_history(circuit, matrix, dt);
            circuit.registry.commit();
        }
        self.sample_prev.copy_from_slice(&matrix.x);

        iterations_used
    }

    /// Stamp every component for one iteration. Uses `self.iter_prev` (the
    /// iterate going into this pass) and `self.sample_prev` (the last
    /// converged sample) for anything that reads node voltages without
    /// borrowing `matrix` while it's mutably borrowed for stamping.
    fn stamp_all(&self, circuit: &Circuit, matrix: &mut MnaMatrix, dt: f64, t: f64) {
        for component in &circuit.components {
            match component {
                Component::Resistor(r) => r.stamp(matrix),
                Component::Capacitor(c) => c.stamp(matrix, dt),
                Component::Inductor(l) => l.stamp(matrix, dt),
                Component::VoltageSource(v) => v.stamp(matrix),
                Component::BehavioralVoltageSource(b) => b.stamp(
                    matrix,
                    &self.iter_prev,
                    &self.sample_prev,
                    &circuit.registry,
                    dt,
                    t,
                ),
                Component::Vcvs(e) => e.stamp(matrix, &self.iter_prev),
                Component::Diode(d) => d.stamp(matrix, &self.iter_prev),
                Component::Bjt(q) => q.stamp(matrix, &self.iter_prev),
                Component::Mosfet(m) => m.stamp(matrix, &self.iter_prev),
                Component::OpAmp(o) => o.stamp(matrix, &self.iter_prev),
                Component::Potentiometer(p) => p.stamp(matrix, &circuit.registry),
                Component::Switch(s) => s.stamp(matrix),
                Component::Subcircuit(x) => x.stamp(matrix),
                Component::ParamEvaluator(_) => {}
            }
        }
    }

    /// Roll every stateful device's history forward. Only called when the
    /// sample converged; a failed sample retains the previous history.
    fn update_history(&mut self, circuit: &mut Circuit, matrix: &MnaMatrix, dt: f64) {
        for component in &mut circuit.components {
            match component {
                Component::Capacitor(c) => c.update_history(matrix, dt),
                Component::Inductor(l) => l.update_history(matrix, dt),
                Component::Diode(d) => d.update_history(&matrix.x),
                Component::Bjt(q) => q.update_history(&matrix.x),
                Component::Mosfet(m) => m.update_history(&matrix.x),
                Component::OpAmp(o) => {
                    o.slew_limit(matrix.voltage(o.output()), dt);
                }
                Component::BehavioralVoltageSource(b) => b.update_history(&matrix.x),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Circuit;
    use crate::dsl::parse;

    fn build(netlist: &str) -> (Circuit, MnaMatrix) {
        let ast = parse(netlist).unwrap();
        let circuit = Circuit::from_ast(ast).unwrap();
        let size = circuit.matrix_size();
        (circuit, MnaMatrix::new(size))
    }

    #[test]
    fn linear_circuit_at_rest_converges_in_one_iteration() {
        // With V1 already at the matrix's zero initial guess, the first
        // (and only) iteration's stamp doesn't move the solution at all.
        let (mut circuit, mut matrix) = build(
            "\
.input in
.output out
V1 in 0 0.0
R1 in out 1k
R2 out 0 1k
",
        );
        let mut nr = NewtonRaphson::new();
        let iters = nr.solve(&mut circuit, &mut matrix, 1.0 / 48000.0, 0.0);
        assert_eq!(iters, 1);
        assert_eq!(nr.failed_count, 0);
    }

    #[test]
    fn diode_clipper_converges() {
        let (mut circuit, mut matrix) = build(
            "\
.input in
.output out
V1 in 0 2.0
R1 in out 1k
D1 out 0
D2 0 out
",
        );
        let mut nr = NewtonRaphson::new();
        let iters = nr.solve(&mut circuit, &mut matrix, 1.0 / 48000.0, 0.0);
        assert!(iters <= nr.max_iterations);
        assert_eq!(nr.failed_count, 0);
        assert!(matrix.voltage(circuit.output_node).abs() < 2.0);
    }
}
