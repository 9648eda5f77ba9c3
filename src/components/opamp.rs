//! Operational amplifier: a five-node VCCS macromodel (out, in+, in-, V+,
//! V-), grounded on the original implementation's `OpAmp` class. Gain is
//! linear in the small-signal region; a pair of smooth boundary clamps
//! pull the output back into the rail-derived headroom when it would
//! otherwise swing past it.

use crate::circuit::{ComponentId, NodeId};
use crate::dsl::ModelDef;
use crate::solver::MnaMatrix;

/// Ceiling on the transconductance derived from `gain/rout`.
const GM_MAX: f64 = 100.0;
/// Differential input resistance.
const R_IN: f64 = 1e6;
/// Quiescent current drawn from the supply rails.
const I_SUPPLY: f64 = 0.002;
/// Saturation current of the boundary-clamp junctions.
const CLAMP_IS: f64 = 1e-9;
/// Thermal-voltage-like steepness of the boundary clamps: small enough
/// for a sharp knee, large enough to stay smooth for Newton-Raphson.
const CLAMP_NVT: f64 = 0.05;
const EXP_CLAMP: f64 = 80.0;

#[derive(Debug, Clone)]
pub struct OpAmpParams {
    /// Open-loop DC gain (A_open).
    pub gain: f64,
    /// Output resistance.
    pub rout: f64,
    /// Slew rate (V/us); 0 disables slew limiting (the default).
    pub slew_rate: f64,
}

impl Default for OpAmpParams {
    fn default() -> Self {
        Self::ideal()
    }
}

impl OpAmpParams {
    pub fn ideal() -> Self {
        Self {
            gain: 1e9,
            rout: 0.1,
            slew_rate: 0.0,
        }
    }

    pub fn ua741() -> Self {
        Self {
            gain: 2e5,
            rout: 75.0,
            slew_rate: 0.5,
        }
    }

    pub fn tl072() -> Self {
        Self {
            gain: 2e5,
            rout: 100.0,
            slew_rate: 13.0,
        }
    }

    pub fn from_model(model: &ModelDef) -> Self {
        let mut params = Self::ideal();
        if let Some(&gain) = model.params.get("gain") {
            params.gain = gain;
        }
        if let Some(&rout) = model.params.get("rout") {
            params.rout = rout;
        }
        if let Some(&sr) = model.params.get("sr") {
            params.slew_rate = sr;
        }
        params
    }

    pub fn gm(&self) -> f64 {
        (self.gain / self.rout).min(GM_MAX)
    }
}

fn headroom(rail_span: f64) -> f64 {
    if rail_span > 18.0 {
        1.5
    } else if rail_span < 12.0 {
        0.3
    } else {
        0.5
    }
}

/// An operational amplifier.
#[derive(Debug, Clone)]
pub struct OpAmp {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 5], // [out, in+, in-, V+, V-]
    pub params: OpAmpParams,
    v_out_prev: f64,
}

impl OpAmp {
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 5], params: OpAmpParams) -> Self {
        Self {
            id,
            name,
            nodes,
            params,
            v_out_prev: 0.0,
        }
    }

    pub fn output(&self) -> NodeId {
        self.nodes[0]
    }
    pub fn input_pos(&self) -> NodeId {
        self.nodes[1]
    }
    pub fn input_neg(&self) -> NodeId {
        self.nodes[2]
    }
    pub fn v_plus(&self) -> NodeId {
        self.nodes[3]
    }
    pub fn v_minus(&self) -> NodeId {
        self.nodes[4]
    }

    fn clamp_junction(real_diff: f64, offset: f64) -> (f64, f64) {
        let vd = real_diff + offset;
        let e = (vd / CLAMP_NVT).min(EXP_CLAMP).exp();
        let i = CLAMP_IS * (e - 1.0);
        let g = CLAMP_IS / CLAMP_NVT * e;
        let i_eq = i - g * real_diff;
        (g, i_eq)
    }

    pub fn stamp(&self, matrix: &mut MnaMatrix, v: &[f64]) {
        let gm = self.params.gm();
        let gout = 1.0 / self.params.rout;
        matrix.stamp_vccs(self.output(), NodeId::GROUND, self.input_pos(), self.input_neg(), gm);
        matrix.stamp_conductance(self.output(), NodeId::GROUND, gout);
        matrix.stamp_conductance(self.input_pos(), self.input_neg(), 1.0 / R_IN);

        let vp = self.v_plus();
        let vm = self.v_minus();
        if !vp.is_ground() {
            matrix.add_source(vp.index(), -I_SUPPLY);
        }
        if !vm.is_ground() {
            matrix.add_source(vm.index(), I_SUPPLY);
        }

        let rail_span = v[vp.index()] - v[vm.index()];
        let hd = headroom(rail_span);

        let v_out = v[self.output().index()];
        let diff_hi = v_out - v[vp.index()];
        let (g_hi, i_eq_hi) = Self::clamp_junction(diff_hi, hd);
        matrix.stamp_norton_source(self.output(), vp, g_hi, -i_eq_hi);

        let diff_lo = v[vm.index()] - v_out;
        let (g_lo, i_eq_lo) = Self::clamp_junction(diff_lo, hd);
        matrix.stamp_norton_source(vm, self.output(), g_lo, -i_eq_lo);
    }

    /// Apply slew-rate limiting to the already-converged output voltage.
    /// Disabled (`slew_rate == 0`) by default.
    pub fn slew_limit(&mut self, v_out_target: f64, dt: f64) -> f64 {
        if self.params.slew_rate <= 0.0 || dt <= 0.0 {
            self.v_out_prev = v_out_target;
            return v_out_target;
        }
        let max_change = self.params.slew_rate * 1e6 * dt;
        let change = (v_out_target - self.v_out_prev).clamp(-max_change, max_change);
        self.v_out_prev += change;
        self.v_out_prev
    }

    pub fn reset(&mut self) {
        self.v_out_prev = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opamp() -> OpAmp {
        OpAmp::new(
            ComponentId(0),
            "U1".to_string(),
            [NodeId(1), NodeId(2), NodeId(3), NodeId(4), NodeId(5)],
            OpAmpParams::ua741(),
        )
    }

    #[test]
    fn headroom_scales_with_rail_span() {
        assert_eq!(headroom(30.0), 1.5);
        assert_eq!(headroom(10.0), 0.3);
        assert_eq!(headroom(15.0), 0.5);
    }

    #[test]
    fn gm_is_capped_at_gm_max() {
        let p = OpAmpParams::ideal();
        assert_eq!(p.gm(), GM_MAX);
    }

    #[test]
    fn clamp_is_quiescent_well_inside_rails() {
        let op = opamp();
        let mut m = MnaMatrix::new(6);
        // output sitting comfortably inside the rails.
        op.stamp(&mut m, &[0.0, 0.0, 0.005, 0.005, 15.0, -15.0]);
        assert!(m.z[1].abs() < 1e-6);
    }

    #[test]
    fn quiescent_current_drawn_from_supplies() {
        let op = opamp();
        let mut m = MnaMatrix::new(6);
        op.stamp(&mut m, &[0.0, 0.0, 0.0, 0.0, 15.0, -15.0]);
        assert_eq!(m.z[4], -I_SUPPLY);
        assert_eq!(m.z[5], I_SUPPLY);
    }
}
