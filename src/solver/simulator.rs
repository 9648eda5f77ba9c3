//! Main simulator interface.

use crate::circuit::Circuit;
use crate::components::Component;

use super::mna::MnaMatrix;
use super::newton::NewtonRaphson;
use super::{CONVERGENCE_TOLERANCE, MAX_ITERATIONS};

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Maximum Newton-Raphson iterations for nonlinear components.
    pub max_iterations: usize,
    /// Convergence tolerance for Newton-Raphson (volts).
    pub tolerance: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            tolerance: CONVERGENCE_TOLERANCE,
        }
    }
}

impl SimulatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum Newton-Raphson iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance (in volts).
    ///
    /// Higher tolerance = faster convergence but less accuracy.
    /// - 1e-6 (default): Very precise, may need more iterations
    /// - 1e-4: Good balance for most audio applications
    /// - 1e-3: Fast, suitable for real-time with some accuracy loss
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// The main circuit simulator. Drives one MNA solve per audio sample and
/// never fails: a non-converging sample is recorded in the Newton-Raphson
/// solver's `failed_count` and the run continues with the last iterate.
pub struct Simulator {
    circuit: Circuit,
    matrix: MnaMatrix,
    newton: NewtonRaphson,
    sample_rate: f32,
    dt: f64,
    /// Running simulation time, fed to behavioural sources and parameter
    /// evaluators that reference `t`.
    t: f64,
    /// Samples processed so far, including warmup.
    samples_run: u64,
    /// `.warmup` converted to a sample count at this sample rate.
    warmup_samples: u64,
}

impl Simulator {
    /// Create a new simulator for the given circuit with default configuration.
    pub fn new(circuit: Circuit, sample_rate: f32) -> Self {
        Self::with_config(circuit, sample_rate, SimulatorConfig::default())
    }

    /// Create a new simulator for the given circuit with custom configuration.
    pub fn with_config(circuit: Circuit, sample_rate: f32, config: SimulatorConfig) -> Self {
        let size = circuit.matrix_size();
        let matrix = MnaMatrix::new(size);
        let newton = NewtonRaphson::with_config(config.max_iterations, config.tolerance);
        let dt = 1.0 / sample_rate as f64;
        let warmup_samples = (circuit.warmup * sample_rate as f64).round().max(0.0) as u64;

        Self {
            circuit,
            matrix,
            newton,
            sample_rate,
            dt,
            t: 0.0,
            samples_run: 0,
            warmup_samples,
        }
    }

    /// Get the sample rate.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Set the input voltage (audio sample).
    pub fn set_input(&mut self, voltage: f32) {
        if let Some(idx) = self.circuit.input_source_idx {
            if let Component::VoltageSource(ref mut vs) = self.circuit.components[idx] {
                vs.set_value(voltage as f64);
            }
        }
    }

    /// Step the simulation by one sample and return the output voltage.
    pub fn step(&mut self) -> f32 {
        self.newton.solve(&mut self.circuit, &mut self.matrix, self.dt, self.t);
        self.t += self.dt;
        self.samples_run += 1;
        self.matrix.voltage(self.circuit.output_node) as f32
    }

    /// Process a block of samples.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (i, &sample) in input.iter().enumerate() {
            self.set_input(sample);
            output[i] = self.step();
        }
    }

    /// Whether the simulator is still within its configured `.warmup`
    /// period and its output should be discarded by the caller.
    pub fn in_warmup(&self) -> bool {
        self.samples_run < self.warmup_samples
    }

    /// Reset all stateful device history and simulation time, keeping the
    /// circuit topology and solver configuration.
    pub fn reset(&mut self) {
        self.circuit.reset_state();
        self.matrix = MnaMatrix::new(self.circuit.matrix_size());
        self.newton = NewtonRaphson::with_config(self.newton.max_iterations, self.newton.tolerance);
        self.t = 0.0;
        self.samples_run = 0;
    }

    /// Get the current voltage at a node by name.
    pub fn node_voltage(&self, name: &str) -> Option<f64> {
        let node = self.circuit.find_node(name)?;
        Some(self.matrix.voltage(node))
    }

    /// Get a reference to the circuit.
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Get a mutable reference to the circuit, for control-surface updates
    /// (potentiometer/switch parameters) between samples.
    pub fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    /// Get a reference to the solved MNA matrix, for probe writers.
    pub fn matrix(&self) -> &MnaMatrix {
        &self.matrix
    }

    /// Current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;

    fn build(netlist: &str) -> Circuit {
        let ast = parse(netlist).unwrap();
        Circuit::from_ast(ast).unwrap()
    }

    #[test]
    fn voltage_divider_settles_to_the_expected_output() {
        let circuit = build(
            "\
.input in
.output out
V1 in 0 2.0
R1 in out 1k
R2 out 0 1k
",
        );
        let mut sim = Simulator::new(circuit, 48000.0);
        sim.set_input(2.0);
        let mut v_out = 0.0;
        for _ in 0..8 {
            v_out = sim.step();
        }
        assert!((v_out - 1.0).abs() < 1e-6);
    }

    #[test]
    fn process_block_fills_the_whole_output_buffer() {
        let circuit = build(
            "\
.input in
.output out
V1 in 0 0.0
R1 in out 1k
R2 out 0 1k
",
        );
        let mut sim = Simulator::new(circuit, 48000.0);
        let input = vec![0.1f32; 16];
        let mut output = vec![0.0f32; 16];
        sim.process_block(&input, &mut output);
        assert!(output.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn warmup_window_is_tracked_and_expires() {
        let circuit = build(
            "\
.warmup 0.0001
.input in
.output out
V1 in 0 0.0
R1 in out 1k
R2 out 0 1k
",
        );
        let mut sim = Simulator::new(circuit, 48000.0);
        assert!(sim.in_warmup());
        for _ in 0..10 {
            sim.step();
        }
        assert!(!sim.in_warmup());
    }
}
