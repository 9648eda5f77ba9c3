//! Diode model: Shockley equation plus an optional backward-Euler junction
//! capacitance, grounded on the original implementation's `Diode` class.

use crate::circuit::{ComponentId, NodeId};
use crate::dsl::ModelDef;
use crate::solver::MnaMatrix;

/// Lower clamp on the diode voltage used for the resistive path.
const VD_MIN: f64 = -5.0;
/// Upper clamp on the diode voltage used for the resistive path.
const VD_MAX: f64 = 1.0;
/// Exponent clamp, in units of `Vt'`, to keep `exp()` finite.
const EXP_CLAMP: f64 = 80.0;

/// Parameters for a diode model.
#[derive(Debug, Clone)]
pub struct DiodeParams {
    /// Saturation current.
    pub is: f64,
    /// Emission coefficient (ideality factor).
    pub n: f64,
    /// Thermal voltage.
    pub vt: f64,
    /// Zero-bias junction capacitance. Zero disables the capacitive stamp.
    pub cj0: f64,
    /// Built-in junction potential.
    pub vj: f64,
    /// Grading coefficient.
    pub mj: f64,
}

impl Default for DiodeParams {
    /// 1N4148-like silicon small-signal diode, the default used when a
    /// netlist `D` record names no model.
    fn default() -> Self {
        Self {
            is: 1e-14,
            n: 1.0,
            vt: 0.02585,
            cj0: 0.0,
            vj: 1.0,
            mj: 0.5,
        }
    }
}

impl DiodeParams {
    /// The 1N4148 preset named explicitly in the concrete test scenarios.
    pub fn silicon_1n4148() -> Self {
        Self {
            is: 5.3e-9,
            n: 1.68,
            vt: 0.02585,
            cj0: 4e-12,
            vj: 0.5,
            mj: 0.4,
        }
    }

    /// Germanium diode: lower forward voltage, higher leakage.
    pub fn germanium() -> Self {
        Self {
            is: 1e-9,
            n: 1.5,
            vt: 0.02585,
            cj0: 0.0,
            vj: 1.0,
            mj: 0.5,
        }
    }

    /// Build parameters from a `.model` definition, falling back to
    /// [`DiodeParams::default`] for anything unspecified.
    pub fn from_model(model: &ModelDef) -> Self {
        let mut params = Self::default();
        if let Some(&is) = model.params.get("is") {
            params.is = is;
        }
        if let Some(&n) = model.params.get("n") {
            params.n = n;
        }
        if let Some(&vt) = model.params.get("vt") {
            params.vt = vt;
        }
        if let Some(&cj0) = model.params.get("cj0") {
            params.cj0 = cj0;
        }
        if let Some(&vj) = model.params.get("vj") {
            params.vj = vj;
        }
        if let Some(&mj) = model.params.get("mj") {
            params.mj = mj;
        }
        params
    }

    pub fn n_vt(&self) -> f64 {
        self.n * self.vt
    }
}

/// A diode.
#[derive(Debug, Clone)]
pub struct Diode {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2], // [anode, cathode]
    pub params: DiodeParams,
    /// Voltage across the junction at the last converged sample.
    pub vd_prev: f64,
    /// Junction capacitance frozen at the start of the current time step.
    cj: f64,
    dt: f64,
}

impl Diode {
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 2], params: DiodeParams) -> Self {
        Self {
            id,
            name,
            nodes,
            params,
            vd_prev: 0.0,
            cj: 0.0,
            dt: 0.0,
        }
    }

    /// Run once at the start of each time step, before the first NR
    /// iteration: freeze `Cj` from `vd_prev`.
    pub fn prepare(&mut self, dt: f64) {
        self.dt = dt;
        if dt > 0.0 && self.params.cj0 > 0.0 {
            let vd_cap_prev = self.vd_prev.clamp(VD_MIN, 0.5);
            self.cj = if vd_cap_prev < 0.0 {
                self.params.cj0 * (1.0 - vd_cap_prev / self.params.vj).powf(-self.params.mj)
            } else {
                self.params.cj0 * 2.0
            };
        } else {
            self.cj = 0.0;
        }
    }

    pub fn stamp(&self, matrix: &mut MnaMatrix, v: &[f64]) {
        let vd = (v[self.nodes[0].index()] - v[self.nodes[1].index()]).clamp(VD_MIN, VD_MAX);
        let n_vt = self.params.n_vt();
        let e = (vd / n_vt).min(EXP_CLAMP).exp();
        let id = self.params.is * (e - 1.0);
        let gd = self.params.is / n_vt * e;
        let i_eq = id - gd * vd;
        matrix.stamp_norton_source(self.nodes[0], self.nodes[1], gd, -i_eq);

        if self.dt > 0.0 && self.params.cj0 > 0.0 {
            let g_cap = self.cj / self.dt;
            let i_cap_eq = g_cap * self.vd_prev;
            matrix.stamp_norton_source(self.nodes[0], self.nodes[1], g_cap, i_cap_eq);
        }
    }

    pub fn update_history(&mut self, v: &[f64]) {
        self.vd_prev = v[self.nodes[0].index()] - v[self.nodes[1].index()];
    }

    pub fn reset(&mut self) {
        self.vd_prev = 0.0;
        self.cj = 0.0;
        self.dt = 0.0;
    }

    /// Total current through the diode: the Shockley current plus the
    /// capacitive contribution, per testable property 6.
    pub fn get_current(&self, v: &[f64]) -> f64 {
        let vd = v[self.nodes[0].index()] - v[self.nodes[1].index()];
        let n_vt = self.params.n_vt();
        let e = (vd / n_vt).min(EXP_CLAMP).exp();
        let id = self.params.is * (e - 1.0);

        let ic = if self.dt > 0.0 && self.params.cj0 > 0.0 {
            self.cj * (vd - self.vd_prev) / self.dt
        } else {
            0.0
        };

        id + ic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diode() -> Diode {
        Diode::new(ComponentId(0), "D1".to_string(), [NodeId(1), NodeId(0)], DiodeParams::default())
    }

    #[test]
    fn forward_bias_current_grows_exponentially() {
        let mut d = diode();
        d.prepare(0.0);
        let low = d.get_current(&[0.0, 0.3]);
        let high = d.get_current(&[0.0, 0.6]);
        assert!(high > low * 100.0);
    }

    #[test]
    fn reverse_bias_saturates_near_minus_is() {
        let mut d = diode();
        d.prepare(0.0);
        let i_rev = d.get_current(&[0.0, -1.0]);
        assert!(i_rev < 0.0);
        assert!(i_rev > -2.0 * d.params.is);
    }

    #[test]
    fn stamp_clamps_voltage_beyond_one_volt() {
        let d = diode();
        let mut m = MnaMatrix::new(2);
        // vd = 10V, should clamp to 1V internally and not blow up gd.
        d.stamp(&mut m, &[10.0, 0.0]);
        assert!(m.get(1, 1).is_finite());
    }

    #[test]
    fn junction_capacitance_frozen_for_the_step() {
        let mut d = Diode::new(
            ComponentId(0),
            "D1".to_string(),
            [NodeId(1), NodeId(0)],
            DiodeParams::silicon_1n4148(),
        );
        d.vd_prev = -0.5;
        d.prepare(1.0 / 48000.0);
        let cj_at_prepare = d.cj;
        // stamp() should use exactly the cj computed in prepare(), not
        // recompute it from the live iterate.
        let mut m = MnaMatrix::new(2);
        d.stamp(&mut m, &[0.1, 0.0]);
        assert_eq!(d.cj, cj_at_prepare);
    }
}
