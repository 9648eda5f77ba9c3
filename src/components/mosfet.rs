//! Level-1 MOSFET model, grounded on the original implementation's `MOSFET`
//! class: square-law triode/saturation current plus backward-Euler gate
//! capacitances. The gate carries no DC conductance.

use crate::circuit::{ComponentId, NodeId};
use crate::dsl::{ModelDef, ModelType};
use crate::error::{PedalerError, Result};
use crate::solver::MnaMatrix;

/// Clamp applied to `vgs`/`vds` before evaluating the square-law model.
const V_CLAMP: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MosfetType {
    Nmos,
    Pmos,
}

#[derive(Debug, Clone)]
pub struct MosfetParams {
    /// Threshold voltage.
    pub vto: f64,
    /// Transconductance coefficient.
    pub kp: f64,
    /// Channel-length modulation.
    pub lambda: f64,
    /// Gate-source overlap capacitance.
    pub cgs0: f64,
    /// Gate-drain overlap capacitance.
    pub cgd0: f64,
}

impl Default for MosfetParams {
    fn default() -> Self {
        Self {
            vto: 2.0,
            kp: 2e-5,
            lambda: 0.01,
            cgs0: 0.0,
            cgd0: 0.0,
        }
    }
}

impl MosfetParams {
    pub fn from_model(model: &ModelDef) -> Result<(MosfetType, Self)> {
        let mosfet_type = match model.model_type {
            ModelType::MosfetN => MosfetType::Nmos,
            ModelType::MosfetP => MosfetType::Pmos,
            _ => {
                return Err(PedalerError::InvalidParameter {
                    component: model.name.clone(),
                    param: "type".to_string(),
                    message: "expected NMOS or PMOS model type".to_string(),
                });
            }
        };

        let mut params = Self::default();
        if let Some(&vto) = model.params.get("vto") {
            params.vto = vto;
        }
        if let Some(&kp) = model.params.get("kp") {
            params.kp = kp;
        }
        if let Some(&lambda) = model.params.get("lambda") {
            params.lambda = lambda;
        }
        if let Some(&cgs0) = model.params.get("cgs0") {
            params.cgs0 = cgs0;
        }
        if let Some(&cgd0) = model.params.get("cgd0") {
            params.cgd0 = cgd0;
        }

        Ok((mosfet_type, params))
    }
}

/// A level-1 MOSFET.
#[derive(Debug, Clone)]
pub struct Mosfet {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 3], // [drain, gate, source]
    pub mosfet_type: MosfetType,
    pub params: MosfetParams,
    vgs_prev: f64,
    vgd_prev: f64,
    dt: f64,
}

impl Mosfet {
    pub fn new(
        id: ComponentId,
        name: String,
        nodes: [NodeId; 3],
        mosfet_type: MosfetType,
        params: MosfetParams,
    ) -> Self {
        Self {
            id,
            name,
            nodes,
            mosfet_type,
            params,
            vgs_prev: 0.0,
            vgd_prev: 0.0,
            dt: 0.0,
        }
    }

    pub fn drain(&self) -> NodeId {
        self.nodes[0]
    }
    pub fn gate(&self) -> NodeId {
        self.nodes[1]
    }
    pub fn source(&self) -> NodeId {
        self.nodes[2]
    }

    fn sign(&self) -> f64 {
        match self.mosfet_type {
            MosfetType::Nmos => 1.0,
            MosfetType::Pmos => -1.0,
        }
    }

    pub fn prepare(&mut self, dt: f64) {
        self.dt = dt;
    }

    /// Square-law drain current and its partials, evaluated in the
    /// NMOS-equivalent frame (voltages already sign-flipped for PMOS).
    fn channel(&self, vgs: f64, vds: f64) -> (f64, f64, f64) {
        let vov = vgs - self.params.vto;
        if vov <= 0.0 {
            return (0.0, 0.0, 0.0);
        }
        let kp = self.params.kp;
        let lambda = self.params.lambda;

        if vds < vov {
            // Triode.
            let id = kp * (vov * vds - vds * vds / 2.0) * (1.0 + lambda * vds);
            let gm = kp * vds * (1.0 + lambda * vds);
            let gds = kp * (vov - vds) * (1.0 + lambda * vds)
                + kp * (vov * vds - vds * vds / 2.0) * lambda;
            (id, gm, gds)
        } else {
            // Saturation.
            let id = 0.5 * kp * vov * vov * (1.0 + lambda * vds);
            let gm = kp * vov * (1.0 + lambda * vds);
            let gds = 0.5 * kp * vov * vov * lambda;
            (id, gm, gds)
        }
    }

    pub fn stamp(&self, matrix: &mut MnaMatrix, v: &[f64]) {
        let vd = v[self.drain().index()];
        let vg = v[self.gate().index()];
        let vs = v[self.source().index()];

        let s = self.sign();
        let vgs_eff = (s * (vg - vs)).clamp(-V_CLAMP, V_CLAMP);
        let vds_eff = (s * (vd - vs)).clamp(-V_CLAMP, V_CLAMP);

        let (id_eff, gm, gds) = self.channel(vgs_eff, vds_eff);
        let id_eq_eff = id_eff - gm * vgs_eff - gds * vds_eff;
        let id_eq = s * id_eq_eff;

        let nd = self.drain();
        let ng = self.gate();
        let ns = self.source();

        if !nd.is_ground() {
            matrix.add(nd.index(), nd.index(), gds);
            if !ns.is_ground() {
                matrix.add(nd.index(), ns.index(), -gds);
            }
            if !ng.is_ground() {
                matrix.add(nd.index(), ng.index(), gm);
            }
            matrix.add_source(nd.index(), id_eq);
        }
        if !ns.is_ground() {
            matrix.add(ns.index(), ns.index(), gds);
            if !nd.is_ground() {
                matrix.add(ns.index(), nd.index(), -gds);
            }
            if !ng.is_ground() {
                matrix.add(ns.index(), ng.index(), -gm);
            }
            matrix.add_source(ns.index(), -id_eq);
        }

        // Gate carries no DC conductance, only backward-Euler charge storage
        // via the overlap capacitances, using the real (non-negated) junction
        // voltages.
        if self.dt > 0.0 {
            if self.params.cgs0 > 0.0 {
                let g = self.params.cgs0 / self.dt;
                let i_eq = g * self.vgs_prev;
                matrix.stamp_norton_source(ng, ns, g, i_eq);
            }
            if self.params.cgd0 > 0.0 {
                let g = self.params.cgd0 / self.dt;
                let i_eq = g * self.vgd_prev;
                matrix.stamp_norton_source(ng, nd, g, i_eq);
            }
        }
    }

    pub fn update_history(&mut self, v: &[f64]) {
        let vd = v[self.drain().index()];
        let vg = v[self.gate().index()];
        let vs = v[self.source().index()];
        self.vgs_prev = vg - vs;
        self.vgd_prev = vg - vd;
    }

    pub fn reset(&mut self) {
        self.vgs_prev = 0.0;
        self.vgd_prev = 0.0;
        self.dt = 0.0;
    }

    pub fn get_current(&self, v: &[f64]) -> f64 {
        let vd = v[self.drain().index()];
        let vg = v[self.gate().index()];
        let vs = v[self.source().index()];
        let s = self.sign();
        let vgs_eff = (s * (vg - vs)).clamp(-V_CLAMP, V_CLAMP);
        let vds_eff = (s * (vd - vs)).clamp(-V_CLAMP, V_CLAMP);
        let (id_eff, _, _) = self.channel(vgs_eff, vds_eff);
        s * id_eff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nmos() -> Mosfet {
        Mosfet::new(
            ComponentId(0),
            "M1".to_string(),
            [NodeId(1), NodeId(2), NodeId(0)],
            MosfetType::Nmos,
            MosfetParams::default(),
        )
    }

    #[test]
    fn cutoff_below_threshold_carries_no_current() {
        let m = nmos();
        let i = m.get_current(&[5.0, 1.0, 0.0]);
        assert_eq!(i, 0.0);
    }

    #[test]
    fn saturation_current_grows_with_overdrive() {
        let m = nmos();
        let i_low = m.get_current(&[5.0, 3.0, 0.0]);
        let i_high = m.get_current(&[5.0, 4.0, 0.0]);
        assert!(i_high > i_low);
    }

    #[test]
    fn pmos_conducts_with_gate_pulled_low() {
        let mut m = nmos();
        m.mosfet_type = MosfetType::Pmos;
        m.params.vto = -2.0;
        // Source at 5V, gate at 2V => vsg = 3V > |vto|.
        let i = m.get_current(&[0.0, 2.0, 5.0]);
        assert!(i < 0.0);
    }

    #[test]
    fn gate_has_no_dc_conductance() {
        let m = nmos();
        let mut matrix = MnaMatrix::new(3);
        m.stamp(&mut matrix, &[5.0, 3.0, 0.0]);
        assert_eq!(matrix.get(1, 1), 0.0);
    }
}
