//! Component models for circuit simulation.
//!
//! This module provides models for all supported circuit components:
//! - Linear: Resistor, Wire, Capacitor, Inductor
//! - Sources: Voltage Source, Behavioural Voltage Source, VCVS
//! - Nonlinear: Diode, BJT, MOSFET, Op-Amp
//! - Controls: Potentiometer, Switch
//! - Meta: Parameter Evaluator, Subcircuit stub
//!
//! Each component implements stamping into the MNA matrix.

mod linear;
mod sources;
mod diode;
mod bjt;
mod mosfet;
mod opamp;
mod controls;
mod param_eval;
mod subcircuit;

pub use linear::{Capacitor, Inductor, Resistor};
pub use sources::{BehavioralVoltageSource, Vcvs, VoltageSource};
pub use diode::Diode;
pub use bjt::{Bjt, BjtType};
pub use mosfet::{Mosfet, MosfetType};
pub use opamp::OpAmp;
pub use controls::{Potentiometer, Switch, Taper};
pub use param_eval::ParamEvaluator;
pub use subcircuit::{Subcircuit, SubcircuitKind};

use crate::circuit::{ComponentId, NodeId};
use crate::dsl::{ComponentDef, ComponentType, ModelDef};
use crate::error::{PedalerError, Result};
use crate::expr::Expression;

/// A circuit component.
#[derive(Debug, Clone)]
pub enum Component {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    VoltageSource(VoltageSource),
    BehavioralVoltageSource(BehavioralVoltageSource),
    Vcvs(Vcvs),
    Diode(Diode),
    Bjt(Bjt),
    Mosfet(Mosfet),
    OpAmp(OpAmp),
    Potentiometer(Potentiometer),
    Switch(Switch),
    ParamEvaluator(ParamEvaluator),
    Subcircuit(Subcircuit),
}

impl Component {
    /// Create a component from a DSL definition. `nodes` is already resolved
    /// (and ground-mapped) in the netlist's own positional order.
    pub fn from_def(
        id: ComponentId,
        def: &ComponentDef,
        nodes: &[NodeId],
        model: Option<&ModelDef>,
    ) -> Result<Self> {
        match def.component_type {
            ComponentType::Resistor => {
                let value = def.value.ok_or_else(|| {
                    PedalerError::invalid_component(&def.name, def.line, "resistor requires a value")
                })?;
                Ok(Component::Resistor(Resistor::new(
                    id,
                    def.name.clone(),
                    [nodes[0], nodes[1]],
                    value,
                )))
            }

            ComponentType::Wire => Ok(Component::Resistor(Resistor::wire(
                id,
                def.name.clone(),
                [nodes[0], nodes[1]],
            ))),

            ComponentType::Capacitor => {
                let value = def.value.ok_or_else(|| {
                    PedalerError::invalid_component(&def.name, def.line, "capacitor requires a value")
                })?;
                Ok(Component::Capacitor(Capacitor::new(
                    id,
                    def.name.clone(),
                    [nodes[0], nodes[1]],
                    value,
                )))
            }

            ComponentType::Inductor => {
                let value = def.value.ok_or_else(|| {
                    PedalerError::invalid_component(&def.name, def.line, "inductor requires a value")
                })?;
                let rs = def
                    .params
                    .get("rs")
                    .or_else(|| def.params.get("rdc"))
                    .copied()
                    .unwrap_or(100.0);
                Ok(Component::Inductor(Inductor::new(
                    id,
                    def.name.clone(),
                    [nodes[0], nodes[1]],
                    value,
                    rs,
                )))
            }

            ComponentType::VoltageSource => {
                let value = def.value.unwrap_or(0.0);
                let rs = def.params.get("rs").copied().unwrap_or(1.0);
                Ok(Component::VoltageSource(VoltageSource::new(
                    id,
                    def.name.clone(),
                    [nodes[0], nodes[1]],
                    value,
                    rs,
                    false,
                )))
            }

            ComponentType::BehavioralVoltageSource => {
                let expr_src = def.string_params.get("v").ok_or_else(|| {
                    PedalerError::invalid_component(
                        &def.name,
                        def.line,
                        "behavioural voltage source requires V=\"<expr>\"",
                    )
                })?;
                let expr = Expression::compile(expr_src).map_err(|e| {
                    PedalerError::invalid_component(
                        &def.name,
                        def.line,
                        format!("invalid expression in V=\"...\": {e}"),
                    )
                })?;
                let rs = def.params.get("rs").copied().unwrap_or(1e-3);
                Ok(Component::BehavioralVoltageSource(
                    BehavioralVoltageSource::new(id, def.name.clone(), [nodes[0], nodes[1]], expr, rs),
                ))
            }

            ComponentType::Vcvs => {
                let rout = def.params.get("rout").copied().unwrap_or(75.0);
                let vmax = def.params.get("vmax").copied().unwrap_or(15.0);
                let vmin = def.params.get("vmin").copied().unwrap_or(-15.0);
                let gain = def.params.get("gain").copied().unwrap_or(100_000.0);
                Ok(Component::Vcvs(Vcvs::new(
                    id,
                    def.name.clone(),
                    [nodes[0], nodes[1], nodes[2], nodes[3]],
                    rout,
                    vmax,
                    vmin,
                    gain,
                )))
            }

            ComponentType::Diode => {
                let params = if let Some(m) = model {
                    diode::DiodeParams::from_model(m)
                } else {
                    diode::DiodeParams::default()
                };
                Ok(Component::Diode(Diode::new(
                    id,
                    def.name.clone(),
                    [nodes[0], nodes[1]], // anode, cathode
                    params,
                )))
            }

            ComponentType::Bjt => {
                let (bjt_type, params) = if let Some(m) = model {
                    bjt::BjtParams::from_model(m)?
                } else {
                    (BjtType::Npn, bjt::BjtParams::default())
                };
                Ok(Component::Bjt(Bjt::new(
                    id,
                    def.name.clone(),
                    [nodes[0], nodes[1], nodes[2]], // C, B, E
                    bjt_type,
                    params,
                )))
            }

            ComponentType::Mosfet => {
                let (mosfet_type, params) = if let Some(m) = model {
                    mosfet::MosfetParams::from_model(m)?
                } else {
                    (MosfetType::Nmos, mosfet::MosfetParams::default())
                };
                Ok(Component::Mosfet(Mosfet::new(
                    id,
                    def.name.clone(),
                    [nodes[0], nodes[1], nodes[2]], // D, G, S
                    mosfet_type,
                    params,
                )))
            }

            ComponentType::OpAmp => {
                let params = if let Some(m) = model {
                    opamp::OpAmpParams::from_model(m)
                } else {
                    // Bare-netlist default: Rout=75 Imax=20m Gain=100k Sr=13.
                    // Imax (max output current) has no corresponding field
                    // in OpAmpParams and is not modeled.
                    opamp::OpAmpParams {
                        gain: 100_000.0,
                        rout: 75.0,
                        slew_rate: 13.0,
                    }
                };
                Ok(Component::OpAmp(OpAmp::new(
                    id,
                    def.name.clone(),
                    [nodes[0], nodes[1], nodes[2], nodes[3], nodes[4]], // out, in+, in-, V+, V-
                    params,
                )))
            }

            ComponentType::Potentiometer => {
                let total_resistance = def.value.ok_or_else(|| {
                    PedalerError::invalid_component(&def.name, def.line, "potentiometer requires a value")
                })?;
                let taper = match def
                    .string_params
                    .get("taper")
                    .map(|s| s.to_ascii_uppercase())
                    .as_deref()
                {
                    Some("LOG") | Some("B") => Taper::Logarithmic,
                    _ => Taper::Linear,
                };
                let param = def
                    .string_params
                    .get("param")
                    .cloned()
                    .unwrap_or_else(|| def.name.clone());
                // Netlist order is [n1, n2, wiper]; the struct wants
                // [n1, wiper, n2].
                Ok(Component::Potentiometer(Potentiometer::new(
                    id,
                    def.name.clone(),
                    [nodes[0], nodes[2], nodes[1]],
                    total_resistance,
                    taper,
                    param,
                )))
            }

            ComponentType::Switch => {
                let closed = def.params.get("state").map(|v| *v > 0.5).unwrap_or(true);
                Ok(Component::Switch(Switch::new(
                    id,
                    def.name.clone(),
                    [nodes[0], nodes[1]],
                    closed,
                )))
            }

            ComponentType::ParamEvaluator => {
                let (target, expr_src) = def.string_params.iter().next().ok_or_else(|| {
                    PedalerError::invalid_component(
                        &def.name,
                        def.line,
                        "parameter evaluator requires <param>=\"<expr>\"",
                    )
                })?;
                let expr = Expression::compile(expr_src).map_err(|e| {
                    PedalerError::invalid_component(
                        &def.name,
                        def.line,
                        format!("invalid expression in {target}=\"...\": {e}"),
                    )
                })?;
                Ok(Component::ParamEvaluator(ParamEvaluator::new(
                    id,
                    def.name.clone(),
                    target.clone(),
                    expr,
                )))
            }

            ComponentType::Subcircuit => {
                let kind_str = def.model_ref.as_deref().ok_or_else(|| {
                    PedalerError::invalid_component(
                        &def.name,
                        def.line,
                        "subcircuit requires a kind (PITCH, PITCH2, FFTPITCH, INTEGRATOR)",
                    )
                })?;
                let kind = match kind_str.to_ascii_uppercase().as_str() {
                    "PITCH" => SubcircuitKind::Pitch,
                    "PITCH2" => SubcircuitKind::Pitch2,
                    "FFTPITCH" => SubcircuitKind::FftPitch,
                    "INTEGRATOR" => SubcircuitKind::Integrator,
                    other => {
                        return Err(PedalerError::invalid_component(
                            &def.name,
                            def.line,
                            format!("unknown subcircuit kind '{other}'"),
                        ));
                    }
                };
                Ok(Component::Subcircuit(Subcircuit::new(
                    id,
                    def.name.clone(),
                    [nodes[0], nodes[1]],
                    kind,
                )))
            }
        }
    }

    /// Get the component ID.
    pub fn id(&self) -> ComponentId {
        match self {
            Component::Resistor(r) => r.id,
            Component::Capacitor(c) => c.id,
            Component::Inductor(l) => l.id,
            Component::VoltageSource(v) => v.id,
            Component::BehavioralVoltageSource(b) => b.id,
            Component::Vcvs(e) => e.id,
            Component::Diode(d) => d.id,
            Component::Bjt(q) => q.id,
            Component::Mosfet(m) => m.id,
            Component::OpAmp(o) => o.id,
            Component::Potentiometer(p) => p.id,
            Component::Switch(s) => s.id,
            Component::ParamEvaluator(a) => a.id,
            Component::Subcircuit(x) => x.id,
        }
    }

    /// Get the component name.
    pub fn name(&self) -> &str {
        match self {
            Component::Resistor(r) => &r.name,
            Component::Capacitor(c) => &c.name,
            Component::Inductor(l) => &l.name,
            Component::VoltageSource(v) => &v.name,
            Component::BehavioralVoltageSource(b) => &b.name,
            Component::Vcvs(e) => &e.name,
            Component::Diode(d) => &d.name,
            Component::Bjt(q) => &q.name,
            Component::Mosfet(m) => &m.name,
            Component::OpAmp(o) => &o.name,
            Component::Potentiometer(p) => &p.name,
            Component::Switch(s) => &s.name,
            Component::ParamEvaluator(a) => &a.name,
            Component::Subcircuit(x) => &x.name,
        }
    }

    /// Check if this component is nonlinear (requires Newton-Raphson
    /// iteration to converge). Diagnostic only; the solver runs the same
    /// uniform per-sample loop regardless.
    pub fn is_nonlinear(&self) -> bool {
        matches!(
            self,
            Component::Diode(_) | Component::Bjt(_) | Component::Mosfet(_) | Component::OpAmp(_)
        )
    }
}
