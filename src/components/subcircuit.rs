//! Opaque subcircuit stubs (`PITCH`, `PITCH2`, `FFTPITCH`, `INTEGRATOR`).
//!
//! These are not electrical companion models: each reads a signal node
//! voltage, runs a small non-electrical algorithm, and drives an output
//! node as a Norton source with a fixed, near-zero series resistance —
//! the same "opaque control-voltage generator" shape the original's
//! single `X` prefix covers for all four kinds.

use crate::circuit::{ComponentId, NodeId};
use crate::solver::MnaMatrix;

/// Series resistance used for every subcircuit's Norton output stage.
const SUBCIRCUIT_RS: f64 = 1e-3;
/// Time constant of the INTEGRATOR's leak.
const INTEGRATOR_TAU: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubcircuitKind {
    Pitch,
    Pitch2,
    FftPitch,
    Integrator,
}

#[derive(Debug, Clone)]
pub struct Subcircuit {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2], // [input, output]
    pub kind: SubcircuitKind,
    // INTEGRATOR state.
    accumulator: f64,
    // Pitch-tracker state (shared by PITCH/PITCH2/FFTPITCH).
    last_sign: f64,
    time_since_crossing: f64,
    period_estimate: f64,
    output_value: f64,
}

impl Subcircuit {
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 2], kind: SubcircuitKind) -> Self {
        Self {
            id,
            name,
            nodes,
            kind,
            accumulator: 0.0,
            last_sign: 1.0,
            time_since_crossing: 0.0,
            period_estimate: 0.0,
            output_value: 0.0,
        }
    }

    pub fn input(&self) -> NodeId {
        self.nodes[0]
    }
    pub fn output(&self) -> NodeId {
        self.nodes[1]
    }

    /// Run the non-electrical algorithm for one sample, ahead of `stamp()`.
    pub fn prepare(&mut self, v_in: f64, dt: f64) {
        match self.kind {
            SubcircuitKind::Integrator => {
                let alpha = dt / (INTEGRATOR_TAU + dt);
                self.accumulator += alpha * (v_in - self.accumulator);
                self.output_value = self.accumulator;
            }
            SubcircuitKind::Pitch | SubcircuitKind::Pitch2 | SubcircuitKind::FftPitch => {
                self.time_since_crossing += dt;
                let sign = if v_in >= 0.0 { 1.0 } else { -1.0 };
                if sign > 0.0 && self.last_sign < 0.0 && self.time_since_crossing > 0.0 {
                    self.period_estimate = self.time_since_crossing;
                    self.time_since_crossing = 0.0;
                }
                self.last_sign = sign;
                self.output_value = if self.period_estimate > 0.0 {
                    1.0 / self.period_estimate
                } else {
                    0.0
                };
            }
        }
    }

    pub fn stamp(&self, matrix: &mut MnaMatrix) {
        let g = 1.0 / SUBCIRCUIT_RS;
        let i_eq = self.output_value * g;
        matrix.stamp_norton_source(self.output(), NodeId::GROUND, g, i_eq);
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.last_sign = 1.0;
        self.time_since_crossing = 0.0;
        self.period_estimate = 0.0;
        self.output_value = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrator_leaks_toward_input() {
        let mut sc = Subcircuit::new(ComponentId(0), "X1".to_string(), [NodeId(1), NodeId(2)], SubcircuitKind::Integrator);
        let dt = 1.0 / 48000.0;
        for _ in 0..10_000 {
            sc.prepare(1.0, dt);
        }
        assert!((sc.output_value - 1.0).abs() < 0.05);
    }

    #[test]
    fn pitch_tracker_estimates_frequency_from_crossings() {
        let mut sc = Subcircuit::new(ComponentId(0), "X1".to_string(), [NodeId(1), NodeId(2)], SubcircuitKind::Pitch);
        let dt = 1.0 / 48000.0;
        let freq = 440.0;
        let mut t = 0.0;
        for _ in 0..2000 {
            let v = (2.0 * std::f64::consts::PI * freq * t).sin();
            sc.prepare(v, dt);
            t += dt;
        }
        assert!(sc.output_value > 0.0);
        assert!((sc.output_value - freq).abs() / freq < 0.2);
    }

    #[test]
    fn stamp_drives_output_as_norton_source() {
        let mut sc = Subcircuit::new(ComponentId(0), "X1".to_string(), [NodeId(1), NodeId(2)], SubcircuitKind::Integrator);
        sc.prepare(1.0, 1.0 / 48000.0);
        let mut m = MnaMatrix::new(3);
        sc.stamp(&mut m);
        assert!(m.get(2, 2) > 0.0);
        assert!(m.z[2] != 0.0);
    }
}
