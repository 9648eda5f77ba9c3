//! Independent, behavioural and voltage-controlled voltage sources. All of
//! them are Norton equivalents: no branch-current unknown is ever added to
//! the system.

use crate::circuit::{ComponentId, NodeId};
use crate::expr::{EvalContext, Expression};
use crate::registry::ParameterRegistry;
use crate::solver::MnaMatrix;

/// An independent (or audio-driven) voltage source: Thevenin `value` in
/// series with `rs`, expressed as its Norton equivalent `g = 1/rs`,
/// `i = value * g` injected into the positive terminal.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2], // [positive, negative]
    pub rs: f64,
    /// If true, `value` is overwritten every sample from the audio input.
    pub is_audio_input: bool,
    value: f64,
}

impl VoltageSource {
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 2], value: f64, rs: f64, is_audio_input: bool) -> Self {
        Self {
            id,
            name,
            nodes,
            rs,
            is_audio_input,
            value,
        }
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn stamp(&self, matrix: &mut MnaMatrix) {
        let g = 1.0 / self.rs;
        let i_eq = self.value * g;
        matrix.stamp_norton_source(self.nodes[0], self.nodes[1], g, i_eq);
    }
}

/// A behavioural voltage source: the output voltage is the result of a
/// compiled expression evaluated fresh every stamp, in series with `rs`.
#[derive(Debug, Clone)]
pub struct BehavioralVoltageSource {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2], // [positive, negative]
    pub rs: f64,
    expr: Expression,
    self_prev: f64,
}

impl BehavioralVoltageSource {
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 2], expr: Expression, rs: f64) -> Self {
        Self {
            id,
            name,
            nodes,
            rs,
            expr,
            self_prev: 0.0,
        }
    }

    pub fn stamp(
        &self,
        matrix: &mut MnaMatrix,
        v: &[f64],
        v_prev: &[f64],
        registry: &ParameterRegistry,
        dt: f64,
        t: f64,
    ) {
        let ctx = EvalContext {
            v,
            v_prev,
            registry,
            dt,
            t,
            self_prev: self.self_prev,
        };
        let value = self.expr.eval(&ctx);
        let g = 1.0 / self.rs;
        let i_eq = value * g;
        matrix.stamp_norton_source(self.nodes[0], self.nodes[1], g, i_eq);
    }

    pub fn update_history(&mut self, v: &[f64]) {
        self.self_prev = v[self.nodes[0].index()] - v[self.nodes[1].index()];
    }

    pub fn reset(&mut self) {
        self.self_prev = 0.0;
    }
}

/// A voltage-controlled voltage source with a soft-clamped gain, grounded
/// on the original implementation's `VCVS` class.
#[derive(Debug, Clone)]
pub struct Vcvs {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 4], // [out+, out-, ctrl+, ctrl-]
    pub rout: f64,
    pub vmax: f64,
    pub vmin: f64,
    pub gain: f64,
}

impl Vcvs {
    pub fn new(
        id: ComponentId,
        name: String,
        nodes: [NodeId; 4],
        rout: f64,
        vmax: f64,
        vmin: f64,
        gain: f64,
    ) -> Self {
        Self {
            id,
            name,
            nodes,
            rout,
            vmax,
            vmin,
            gain,
        }
    }

    pub fn out_pos(&self) -> NodeId {
        self.nodes[0]
    }
    pub fn out_neg(&self) -> NodeId {
        self.nodes[1]
    }
    pub fn ctrl_pos(&self) -> NodeId {
        self.nodes[2]
    }
    pub fn ctrl_neg(&self) -> NodeId {
        self.nodes[3]
    }

    /// `v_t = Vmax*tanh(Gain*(V[c+]-V[c-])/Vmax)`, a continuous-derivative
    /// soft clamp. `vmin` is retained as a netlist attribute but, per the
    /// algorithm this is grounded on, does not enter this formula.
    pub fn stamp(&self, matrix: &mut MnaMatrix, v: &[f64]) {
        let vc = v[self.ctrl_pos().index()] - v[self.ctrl_neg().index()];
        let v_target = self.vmax * (self.gain * vc / self.vmax).tanh();
        let g = 1.0 / self.rout;
        let i_eq = v_target * g;
        matrix.stamp_norton_source(self.out_pos(), self.out_neg(), g, i_eq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voltage_source_norton_equivalent() {
        let vs = VoltageSource::new(ComponentId(0), "V1".to_string(), [NodeId(1), NodeId(0)], 9.0, 1.0, false);
        let mut m = MnaMatrix::new(2);
        vs.stamp(&mut m);
        assert_eq!(m.get(1, 1), 1.0);
        assert_eq!(m.z[1], 9.0);
    }

    #[test]
    fn vcvs_soft_clamps_beyond_vmax() {
        let vcvs = Vcvs::new(
            ComponentId(0),
            "E1".to_string(),
            [NodeId(1), NodeId(0), NodeId(2), NodeId(0)],
            75.0,
            15.0,
            -15.0,
            100_000.0,
        );
        let mut m = MnaMatrix::new(3);
        // 1V control with huge gain should saturate near vmax.
        vcvs.stamp(&mut m, &[0.0, 0.0, 1.0]);
        let i_eq = m.z[1];
        let v_target = i_eq * vcvs.rout;
        assert!(v_target < 15.0);
        assert!(v_target > 14.9);
    }

    #[test]
    fn vcvs_is_antisymmetric_in_control_voltage() {
        let vcvs = Vcvs::new(
            ComponentId(0),
            "E1".to_string(),
            [NodeId(1), NodeId(0), NodeId(2), NodeId(0)],
            75.0,
            15.0,
            -15.0,
            100_000.0,
        );
        let mut m_pos = MnaMatrix::new(3);
        vcvs.stamp(&mut m_pos, &[0.0, 0.0, 1.0]);
        let mut m_neg = MnaMatrix::new(3);
        vcvs.stamp(&mut m_neg, &[0.0, 0.0, -1.0]);
        assert!((m_pos.z[1] + m_neg.z[1]).abs() < 1e-9);
    }
}
