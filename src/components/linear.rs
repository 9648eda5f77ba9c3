//! Linear passive components: Resistor, Wire, Capacitor, Inductor.

use crate::circuit::{ComponentId, NodeId};
use crate::solver::MnaMatrix;

/// Resistance floor: any resistor (or potentiometer leg) below this is
/// clamped to it rather than risking numerical blow-up.
pub const R_MIN: f64 = 1e-6;

/// Resistance ceiling: a resistor above this is treated as an open circuit
/// and skips its stamp entirely.
pub const R_MAX: f64 = 1e12;

/// Fixed resistance used for the `Wire` specialisation of a resistor.
pub const R_WIRE: f64 = 1e-3;

/// A resistor.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2],
    pub resistance: f64,
}

impl Resistor {
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 2], resistance: f64) -> Self {
        Self {
            id,
            name,
            nodes,
            resistance,
        }
    }

    /// A resistor specialised to a fixed, near-zero resistance.
    pub fn wire(id: ComponentId, name: String, nodes: [NodeId; 2]) -> Self {
        Self::new(id, name, nodes, R_WIRE)
    }

    pub fn stamp(&self, matrix: &mut MnaMatrix) {
        if self.resistance > R_MAX {
            return;
        }
        let g = 1.0 / self.resistance.max(R_MIN);
        matrix.stamp_conductance(self.nodes[0], self.nodes[1], g);
    }
}

/// A capacitor, integrated with the trapezoidal rule.
///
/// `i(t) = (2C/dt)*v(t) - i_eq(t-dt)`, where
/// `i_eq(t-dt) = (2C/dt)*v(t-dt) + i(t-dt)`. This gives a companion
/// conductance `g_eq = 2C/dt` and an equivalent current source.
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2],
    pub capacitance: f64,
    pub v_prev: f64,
    pub i_prev: f64,
}

impl Capacitor {
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 2], capacitance: f64) -> Self {
        Self {
            id,
            name,
            nodes,
            capacitance,
            v_prev: 0.0,
            i_prev: 0.0,
        }
    }

    /// Set the initial voltage (`.ic` directive).
    pub fn set_initial_voltage(&mut self, v: f64) {
        self.v_prev = v;
        self.i_prev = 0.0;
    }

    pub fn conductance(&self, dt: f64) -> f64 {
        2.0 * self.capacitance / dt
    }

    /// Equivalent current injected from n1 to n2: `g_eq*v_prev + i_prev`.
    fn i_eq(&self, dt: f64) -> f64 {
        self.conductance(dt) * self.v_prev + self.i_prev
    }

    pub fn stamp(&self, matrix: &mut MnaMatrix, dt: f64) {
        if dt == 0.0 {
            // DC analysis: a capacitor is an open circuit.
            return;
        }
        let g = self.conductance(dt);
        let i_eq = self.i_eq(dt);
        matrix.stamp_norton_source(self.nodes[0], self.nodes[1], g, i_eq);
    }

    pub fn update_history(&mut self, matrix: &MnaMatrix, dt: f64) {
        if dt == 0.0 {
            return;
        }
        let v_now = matrix.voltage(self.nodes[0]) - matrix.voltage(self.nodes[1]);
        let g = self.conductance(dt);
        let i_new = g * (v_now - self.v_prev) - self.i_prev;
        self.v_prev = v_now;
        self.i_prev = i_new;
    }

    pub fn reset(&mut self) {
        self.v_prev = 0.0;
        self.i_prev = 0.0;
    }
}

/// An inductor, integrated with the trapezoidal rule and expressed purely
/// as a Norton source (no auxiliary branch-current unknown): `R_eq = 2L/dt
/// + R_dc`, `V_eq = (2L/dt)*i_prev + v_prev + R_dc*i_prev`,
/// `I_eq = V_eq / R_eq`.
#[derive(Debug, Clone)]
pub struct Inductor {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2],
    pub inductance: f64,
    pub series_resistance: f64,
    pub i_prev: f64,
    pub v_prev: f64,
}

impl Inductor {
    pub fn new(
        id: ComponentId,
        name: String,
        nodes: [NodeId; 2],
        inductance: f64,
        series_resistance: f64,
    ) -> Self {
        Self {
            id,
            name,
            nodes,
            inductance,
            series_resistance,
            i_prev: 0.0,
            v_prev: 0.0,
        }
    }

    fn r_eq(&self, dt: f64) -> f64 {
        2.0 * self.inductance / dt + self.series_resistance
    }

    pub fn stamp(&self, matrix: &mut MnaMatrix, dt: f64) {
        if dt == 0.0 {
            // DC analysis: an inductor is a short (very large conductance).
            matrix.stamp_conductance(self.nodes[0], self.nodes[1], 1.0 / R_MIN);
            return;
        }
        let r_eq = self.r_eq(dt);
        let g_eq = 1.0 / r_eq;
        let v_eq = 2.0 * self.inductance / dt * self.i_prev
            + self.v_prev
            + self.series_resistance * self.i_prev;
        let i_eq = v_eq * g_eq;
        matrix.stamp_norton_source(self.nodes[0], self.nodes[1], g_eq, -i_eq);
    }

    pub fn update_history(&mut self, matrix: &MnaMatrix, dt: f64) {
        if dt == 0.0 {
            return;
        }
        let v_now = matrix.voltage(self.nodes[0]) - matrix.voltage(self.nodes[1]);
        self.i_prev += dt / (2.0 * self.inductance) * (v_now + self.v_prev);
        self.v_prev = v_now;
    }

    pub fn reset(&mut self) {
        self.i_prev = 0.0;
        self.v_prev = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resistor_conductance() {
        let r = Resistor::new(ComponentId(0), "R1".to_string(), [NodeId(1), NodeId(0)], 1000.0);
        let mut m = MnaMatrix::new(2);
        r.stamp(&mut m);
        assert!((m.get(1, 1) - 0.001).abs() < 1e-10);
    }

    #[test]
    fn resistor_above_r_max_is_open() {
        let r = Resistor::new(ComponentId(0), "R1".to_string(), [NodeId(1), NodeId(0)], 1e13);
        let mut m = MnaMatrix::new(2);
        r.stamp(&mut m);
        assert_eq!(m.get(1, 1), 0.0);
    }

    #[test]
    fn capacitor_companion_model() {
        let mut c = Capacitor::new(ComponentId(0), "C1".to_string(), [NodeId(1), NodeId(0)], 1e-6);
        let dt = 1.0 / 48000.0;
        assert!((c.conductance(dt) - 0.096).abs() < 1e-6);

        let mut m = MnaMatrix::new(2);
        c.stamp(&mut m, dt);
        m.x[1] = 1.0;
        c.update_history(&m, dt);
        assert!((c.v_prev - 1.0).abs() < 1e-10);
        // i_prev = g*(1 - 0) - 0 = g
        assert!((c.i_prev - c.conductance(dt)).abs() < 1e-9);
    }

    #[test]
    fn dc_analysis_opens_capacitor() {
        let c = Capacitor::new(ComponentId(0), "C1".to_string(), [NodeId(1), NodeId(0)], 1e-6);
        let mut m = MnaMatrix::new(2);
        c.stamp(&mut m, 0.0);
        assert_eq!(m.get(1, 1), 0.0);
    }
}
