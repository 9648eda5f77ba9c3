//! BJT model: Ebers-Moll with junction voltage limiting, grounded on the
//! original implementation's `BJT` class.

use crate::circuit::{ComponentId, NodeId};
use crate::dsl::{ModelDef, ModelType};
use crate::error::{PedalerError, Result};
use crate::solver::MnaMatrix;

/// Maximum per-iteration step allowed on a junction voltage before it is
/// clamped, carrying sign.
const V_LIMIT: f64 = 0.5;
/// Exponent clamp, in units of `Vt`, to keep `exp()` finite.
const EXP_CLAMP: f64 = 80.0;
/// Diagonal conductance floor added at each terminal to suppress floating
/// nodes.
const G_MIN_STABILITY: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BjtType {
    Npn,
    Pnp,
}

#[derive(Debug, Clone)]
pub struct BjtParams {
    pub is: f64,
    pub bf: f64,
    pub br: f64,
    pub vt: f64,
}

impl Default for BjtParams {
    fn default() -> Self {
        Self {
            is: 1e-14,
            bf: 100.0,
            br: 1.0,
            vt: 0.02585,
        }
    }
}

impl BjtParams {
    pub fn from_model(model: &ModelDef) -> Result<(BjtType, Self)> {
        let bjt_type = match model.model_type {
            ModelType::BjtNpn => BjtType::Npn,
            ModelType::BjtPnp => BjtType::Pnp,
            _ => {
                return Err(PedalerError::InvalidParameter {
                    component: model.name.clone(),
                    param: "type".to_string(),
                    message: "expected NPN or PNP model type".to_string(),
                });
            }
        };

        let mut params = Self::default();
        if let Some(&is) = model.params.get("is") {
            params.is = is;
        }
        if let Some(&bf) = model.params.get("bf") {
            params.bf = bf;
        }
        if let Some(&br) = model.params.get("br") {
            params.br = br;
        }
        if let Some(&vt) = model.params.get("vt") {
            params.vt = vt;
        }

        Ok((bjt_type, params))
    }
}

/// Clamp a proposed junction voltage step against its previous value:
/// limit the per-iteration step to `V_LIMIT`, and seed a wild first guess
/// near 0.7V so the exponential doesn't blow up on a cold start.
fn limit_junction(v_new: f64, v_old: f64) -> f64 {
    let dv = v_new - v_old;
    if dv.abs() > V_LIMIT {
        v_old + V_LIMIT.copysign(dv)
    } else if v_new.abs() > 1.0 && v_old.abs() < 0.1 {
        0.7f64.copysign(v_new)
    } else {
        v_new
    }
}

/// A bipolar junction transistor.
#[derive(Debug, Clone)]
pub struct Bjt {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 3], // [collector, base, emitter]
    pub bjt_type: BjtType,
    pub params: BjtParams,
    pub vbe_prev: f64,
    pub vbc_prev: f64,
}

impl Bjt {
    pub fn new(
        id: ComponentId,
        name: String,
        nodes: [NodeId; 3],
        bjt_type: BjtType,
        params: BjtParams,
    ) -> Self {
        Self {
            id,
            name,
            nodes,
            bjt_type,
            params,
            vbe_prev: 0.0,
            vbc_prev: 0.0,
        }
    }

    pub fn collector(&self) -> NodeId {
        self.nodes[0]
    }
    pub fn base(&self) -> NodeId {
        self.nodes[1]
    }
    pub fn emitter(&self) -> NodeId {
        self.nodes[2]
    }

    fn sign(&self) -> f64 {
        match self.bjt_type {
            BjtType::Npn => 1.0,
            BjtType::Pnp => -1.0,
        }
    }

    pub fn stamp(&self, matrix: &mut MnaMatrix, v: &[f64]) {
        let vc = v[self.collector().index()];
        let vb = v[self.base().index()];
        let ve = v[self.emitter().index()];

        let vbe_raw = vb - ve;
        let vbc_raw = vb - vc;
        let vbe_limited = limit_junction(vbe_raw, self.vbe_prev);
        let vbc_limited = limit_junction(vbc_raw, self.vbc_prev);

        let s = self.sign();
        let vbe = s * vbe_limited;
        let vbc = s * vbc_limited;

        let vt = self.params.vt;
        let exp_vbe = (vbe / vt).min(EXP_CLAMP).exp();
        let exp_vbc = (vbc / vt).min(EXP_CLAMP).exp();

        let if_diode = self.params.is * (exp_vbe - 1.0);
        let ir_diode = self.params.is * (exp_vbc - 1.0);

        let ib = if_diode / self.params.bf + ir_diode / self.params.br;
        let ic = if_diode - ir_diode;
        let ie = -(ib + ic);

        let gbe = self.params.is / (self.params.bf * vt) * exp_vbe;
        let gbc = self.params.is / (self.params.br * vt) * exp_vbc;
        let gce = self.params.is / vt * exp_vbe;
        let gcc = -self.params.is / vt * exp_vbc;

        let ieq_b = ib - (gbe * vbe + gbc * vbc);
        let ieq_c = ic - (gce * vbe + gcc * vbc);
        let ieq_e = ie - (-(gbe + gce) * vbe - (gbc + gcc) * vbc);

        // dI_base/d{Vb,Vc,Ve}
        let g_b_b = gbe + gbc;
        let g_b_c = -gbc;
        let g_b_e = -gbe;
        // dI_collector/d{Vb,Vc,Ve}
        let g_c_b = gce + gcc;
        let g_c_c = -gcc;
        let g_c_e = -gce;
        // dI_emitter/d{Vb,Vc,Ve}
        let g_e_b = -(gbe + gce);
        let g_e_c = gbc + gcc;
        let g_e_e = gbe + gce;

        let nb = self.base();
        let nc = self.collector();
        let ne = self.emitter();

        stamp_row(matrix, nb, nb, g_b_b, nc, g_b_c, ne, g_b_e, -s * ieq_b);
        stamp_row(matrix, nc, nb, g_c_b, nc, g_c_c, ne, g_c_e, -s * ieq_c);
        stamp_row(matrix, ne, nb, g_e_b, nc, g_e_c, ne, g_e_e, -s * ieq_e);

        for n in [nb, nc, ne] {
            if !n.is_ground() {
                matrix.add(n.index(), n.index(), G_MIN_STABILITY);
            }
        }
    }

    pub fn update_history(&mut self, v: &[f64]) {
        let vc = v[self.collector().index()];
        let vb = v[self.base().index()];
        let ve = v[self.emitter().index()];
        let s = self.sign();
        self.vbe_prev = s * (vb - ve);
        self.vbc_prev = s * (vb - vc);
    }

    pub fn reset(&mut self) {
        self.vbe_prev = 0.0;
        self.vbc_prev = 0.0;
    }

    /// Collector current, including the deliberate deviation from canonical
    /// Ebers-Moll (`Ic = If - Ir*(1 + 1/Br)`) carried over from the original
    /// implementation's `getCurrent`.
    pub fn get_current(&self, v: &[f64]) -> f64 {
        let vc = v[self.collector().index()];
        let vb = v[self.base().index()];
        let ve = v[self.emitter().index()];
        let s = self.sign();
        let vbe = s * (vb - ve);
        let vbc = s * (vb - vc);

        let vt = self.params.vt;
        let exp_vbe = (vbe / vt).min(EXP_CLAMP).exp();
        let exp_vbc = (vbc / vt).min(EXP_CLAMP).exp();
        let if_diode = self.params.is * (exp_vbe - 1.0);
        let ir_diode = self.params.is * (exp_vbc - 1.0);

        let ic = if_diode - ir_diode * (1.0 + 1.0 / self.params.br);
        s * ic
    }
}

#[allow(clippy::too_many_arguments)]
fn stamp_row(
    matrix: &mut MnaMatrix,
    row: NodeId,
    nb: NodeId,
    g_b: f64,
    nc: NodeId,
    g_c: f64,
    ne: NodeId,
    g_e: f64,
    ieq: f64,
) {
    if row.is_ground() {
        return;
    }
    let r = row.index();
    if !nb.is_ground() {
        matrix.add(r, nb.index(), g_b);
    }
    if !nc.is_ground() {
        matrix.add(r, nc.index(), g_c);
    }
    if !ne.is_ground() {
        matrix.add(r, ne.index(), g_e);
    }
    matrix.add_source(r, ieq);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getcurrent_deviates_from_canonical_ebers_moll() {
        let bjt = Bjt::new(
            ComponentId(0),
            "Q1".to_string(),
            [NodeId(1), NodeId(2), NodeId(3)],
            BjtType::Npn,
            BjtParams::default(),
        );
        let v = [0.0, 5.0, 0.65, 0.0];
        let ic = bjt.get_current(&v);

        let vt = bjt.params.vt;
        let vbe = v[2] - v[3];
        let vbc = v[2] - v[0];
        let if_d = bjt.params.is * ((vbe / vt).min(EXP_CLAMP).exp() - 1.0);
        let ir_d = bjt.params.is * ((vbc / vt).min(EXP_CLAMP).exp() - 1.0);
        let canonical = if_d - ir_d;
        assert!((ic - canonical).abs() > 1e-15);
    }

    #[test]
    fn limit_junction_clamps_large_steps() {
        assert_eq!(limit_junction(2.0, 0.0), 0.5);
        assert_eq!(limit_junction(-2.0, 0.0), -0.5);
    }

    #[test]
    fn limit_junction_seeds_cold_start() {
        assert_eq!(limit_junction(5.0, 0.02), 0.7);
    }
}
