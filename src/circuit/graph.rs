//! Circuit graph structure.

use std::collections::HashMap;

use super::types::{ComponentId, NodeId};
use crate::components::Component;
use crate::dsl::{CircuitAst, ProbeKind};
use crate::error::{PedalerError, Result};
use crate::registry::ParameterRegistry;

/// What a `.probe` directive resolves to, once names are bound to circuit
/// indices. `None` means the name never matched a node or component; the
/// probe writer renders that column as `NaN` every sample rather than
/// failing the whole run.
#[derive(Debug, Clone)]
pub enum ProbeTarget {
    Voltage(Option<NodeId>),
    Current(Option<usize>),
}

/// A `.probe` directive, resolved against the built circuit.
#[derive(Debug, Clone)]
pub struct ResolvedProbe {
    /// CSV column header, e.g. `V(out)` or `I(R1)`.
    pub label: String,
    pub target: ProbeTarget,
}

/// A complete circuit ready for simulation.
#[derive(Debug)]
pub struct Circuit {
    /// All components in the circuit.
    pub components: Vec<Component>,

    /// Mapping from node names to node IDs.
    pub node_map: HashMap<String, NodeId>,

    /// Reverse mapping from node IDs to names (for error messages).
    pub node_names: Vec<String>,

    /// Number of nodes, including ground at index 0. This is the full MNA
    /// system size: ground is a real row/column, pinned after all device
    /// stamps rather than excluded from the system.
    pub num_nodes: usize,

    /// Input node ID (where audio signal is injected).
    pub input_node: NodeId,

    /// Output node ID (where audio signal is read).
    pub output_node: NodeId,

    /// Index of the input voltage source component.
    pub input_source_idx: Option<usize>,

    /// Parameter registry seeded from `.param` globals and written to by
    /// parameter evaluators and potentiometer/switch controls.
    pub registry: ParameterRegistry,

    /// Resolved `.probe` targets, in declaration order.
    pub probes: Vec<ResolvedProbe>,

    /// `.warmup` seconds to simulate before recording output.
    pub warmup: f64,
}

impl Circuit {
    /// Build a circuit from a parsed AST.
    pub fn from_ast(ast: CircuitAst) -> Result<Self> {
        let mut node_map = HashMap::new();
        let mut node_names = Vec::new();

        // Ground is always node 0, a real row/column in the system.
        node_map.insert("0".to_string(), NodeId::GROUND);
        node_map.insert("GND".to_string(), NodeId::GROUND);
        node_names.push("0".to_string());

        // Assign IDs to all other nodes.
        let mut next_id = 1usize;
        for node_name in &ast.nodes {
            if !node_map.contains_key(node_name) {
                node_map.insert(node_name.clone(), NodeId(next_id));
                node_names.push(node_name.clone());
                next_id += 1;
            }
        }

        // Also add nodes from components that might not be in the explicit list.
        for comp in &ast.components {
            for node_name in &comp.nodes {
                let normalized = if node_name == "GND" { "0" } else { node_name };
                if !node_map.contains_key(normalized) {
                    node_map.insert(normalized.to_string(), NodeId(next_id));
                    node_names.push(normalized.to_string());
                    next_id += 1;
                }
            }
        }

        let num_nodes = next_id;

        let input_node_name = ast.input_node.as_ref().ok_or(PedalerError::MissingInput)?;
        let output_node_name = ast.output_node.as_ref().ok_or(PedalerError::MissingOutput)?;

        let input_node = *node_map
            .get(input_node_name)
            .ok_or_else(|| PedalerError::NodeNotFound {
                node: input_node_name.clone(),
            })?;

        let output_node = *node_map
            .get(output_node_name)
            .ok_or_else(|| PedalerError::NodeNotFound {
                node: output_node_name.clone(),
            })?;

        let mut registry = ParameterRegistry::new();
        for (name, value) in &ast.global_params {
            registry.set(name, *value);
        }

        // Convert components.
        let mut components = Vec::with_capacity(ast.components.len());
        let mut component_names: HashMap<String, usize> = HashMap::new();
        let mut input_source_idx = None;

        for (idx, comp_def) in ast.components.into_iter().enumerate() {
            let nodes: Vec<NodeId> = comp_def
                .nodes
                .iter()
                .map(|name| {
                    let normalized = if name == "GND" { "0" } else { name };
                    node_map.get(normalized).copied().ok_or_else(|| {
                        PedalerError::NodeNotFound {
                            node: name.clone(),
                        }
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let model = comp_def
                .model_ref
                .as_ref()
                .and_then(|name| ast.models.get(name).cloned());

            let component = Component::from_def(ComponentId(idx), &comp_def, &nodes, model.as_ref())?;

            if let Component::VoltageSource(ref vs) = component {
                if vs.nodes[0] == input_node || vs.nodes[1] == input_node {
                    input_source_idx = Some(components.len());
                }
            }

            component_names.insert(comp_def.name.clone(), components.len());
            components.push(component);
        }

        // Apply `.ic` initial conditions to named capacitors.
        for (cap_name, volts) in &ast.initial_conditions {
            if let Some(&idx) = component_names.get(cap_name) {
                if let Component::Capacitor(ref mut c) = components[idx] {
                    c.set_initial_voltage(*volts);
                }
            }
        }

        // Resolve `.probe` targets against nodes/components.
        let mut probes = Vec::with_capacity(ast.probes.len());
        for spec in &ast.probes {
            match spec.kind {
                ProbeKind::Voltage => {
                    let node = node_map.get(&spec.target).copied();
                    probes.push(ResolvedProbe {
                        label: format!("V({})", spec.target),
                        target: ProbeTarget::Voltage(node),
                    });
                }
                ProbeKind::Current => {
                    let idx = component_names.get(&spec.target).copied();
                    probes.push(ResolvedProbe {
                        label: format!("I({})", spec.target),
                        target: ProbeTarget::Current(idx),
                    });
                }
            }
        }

        Ok(Circuit {
            components,
            node_map,
            node_names,
            num_nodes,
            input_node,
            output_node,
            input_source_idx,
            registry,
            probes,
            warmup: ast.warmup,
        })
    }

    /// Total size of the MNA system: every node, ground included.
    pub fn matrix_size(&self) -> usize {
        self.num_nodes
    }

    /// Find a node ID by name.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_map.get(name).copied()
    }

    /// Get the name of a node.
    pub fn node_name(&self, node: NodeId) -> &str {
        &self.node_names[node.0]
    }

    /// Reset all stateful component history (capacitor/inductor charge,
    /// diode junction memory, behavioural-source and subcircuit state) to
    /// its zero condition, for re-running a circuit from a clean slate.
    pub fn reset_state(&mut self) {
        for component in &mut self.components {
            match component {
                Component::Capacitor(c) => c.reset(),
                Component::Inductor(l) => l.reset(),
                Component::Diode(d) => d.reset(),
                Component::Bjt(q) => q.reset(),
                Component::Mosfet(m) => m.reset(),
                Component::OpAmp(o) => o.reset(),
                Component::BehavioralVoltageSource(b) => b.reset(),
                Component::Subcircuit(x) => x.reset(),
                _ => {}
            }
        }
    }
}
