//! DC operating point and impedance-sweep analysis drivers, built on top of
//! the same Newton-Raphson transient loop used for audio processing.

use crate::circuit::{Circuit, ComponentId, NodeId};
use crate::components::{Component, Resistor};

use super::mna::MnaMatrix;
use super::newton::NewtonRaphson;
use super::MIN_CONDUCTANCE;

/// DC operating point: the transient driver with `dt = 0`, at which
/// reactive devices degenerate (capacitors open, inductors short) and the
/// solution is the circuit's steady-state bias. Returns node voltages
/// indexed by `NodeId`, ground included.
pub fn operating_point(circuit: &mut Circuit) -> Vec<f64> {
    let size = circuit.matrix_size();
    let mut matrix = MnaMatrix::new(size);
    let mut newton = NewtonRaphson::new();
    newton.solve(circuit, &mut matrix, 0.0, 0.0);
    matrix.x
}

/// Small-signal output impedance at `freq_hz`, measured at the circuit's
/// output node by comparing the open-circuit response against the response
/// with a known load conductance attached, correlating both against
/// `cos(wt) - j*sin(wt)` over the second half of the simulated window to
/// discard startup transient.
pub fn output_impedance(
    circuit: &mut Circuit,
    sample_rate: f64,
    freq_hz: f64,
    amplitude: f64,
    load_g: f64,
    cycles: usize,
) -> f64 {
    let dt = 1.0 / sample_rate;
    let omega = 2.0 * std::f64::consts::PI * freq_hz;
    let samples_per_cycle = (sample_rate / freq_hz).round().max(1.0) as usize;
    let total_samples = (samples_per_cycle * cycles.max(1)).max(2);
    let start = total_samples / 2;

    let (v_oc_re, v_oc_im) = drive_and_correlate(circuit, None, dt, omega, amplitude, total_samples, start);
    let (v_ld_re, v_ld_im) =
        drive_and_correlate(circuit, Some(load_g), dt, omega, amplitude, total_samples, start);

    // Current delivered to the load phasor: I = V_load * load_g (real conductance).
    let i_ld_re = v_ld_re * load_g;
    let i_ld_im = v_ld_im * load_g;

    // Voltage dropped across the circuit's own (Thevenin) output impedance.
    let drop_re = v_oc_re - v_ld_re;
    let drop_im = v_oc_im - v_ld_im;

    let num_mag = (drop_re * drop_re + drop_im * drop_im).sqrt();
    let den_mag = (i_ld_re * i_ld_re + i_ld_im * i_ld_im).sqrt();

    if den_mag < 1e-15 {
        f64::INFINITY
    } else {
        num_mag / den_mag
    }
}

/// Run a driven transient for `total_samples`, optionally with a resistive
/// load temporarily appended to the circuit's output node, and return the
/// complex phasor of the output node voltage correlated from `start`.
fn drive_and_correlate(
    circuit: &mut Circuit,
    load_g: Option<f64>,
    dt: f64,
    omega: f64,
    amplitude: f64,
    total_samples: usize,
    start: usize,
) -> (f64, f64) {
    circuit.reset_state();
    let mut matrix = MnaMatrix::new(circuit.matrix_size());
    let mut newton = NewtonRaphson::new();

    let load_idx = load_g.map(|g| {
        let r = 1.0 / g.max(MIN_CONDUCTANCE);
        let id = ComponentId(circuit.components.len());
        circuit.components.push(Component::Resistor(Resistor::new(
            id,
            "__zout_load".to_string(),
            [circuit.output_node, NodeId::GROUND],
            r,
        )));
        circuit.components.len() - 1
    });

    let mut samples = Vec::with_capacity(total_samples);
    let mut t = 0.0;
    for _ in 0..total_samples {
        if let Some(idx) = circuit.input_source_idx {
            if let Component::VoltageSource(ref mut vs) = circuit.components[idx] {
                vs.set_value(amplitude * (omega * t).cos());
            }
        }
        newton.solve(circuit, &mut matrix, dt, t);
        samples.push(matrix.voltage(circuit.output_node));
        t += dt;
    }

    if let Some(idx) = load_idx {
        circuit.components.remove(idx);
    }

    correlate(&samples, dt, omega, start)
}

/// Correlate a real signal against `cos(wt) - j*sin(wt)` to recover its
/// complex phasor (real, imaginary) at angular frequency `omega`.
fn correlate(samples: &[f64], dt: f64, omega: f64, start: usize) -> (f64, f64) {
    let window = &samples[start..];
    let n = window.len().max(1) as f64;
    let mut re = 0.0;
    let mut im = 0.0;
    for (k, &v) in window.iter().enumerate() {
        let t = (start + k) as f64 * dt;
        re += v * (omega * t).cos();
        im -= v * (omega * t).sin();
    }
    let scale = 2.0 / n;
    (re * scale, im * scale)
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
    fn operating_point_of_a_resting_divider_matches_dc_math() {
        let mut circuit = build(
            "\
.input in
.output out
V1 in 0 4.0
R1 in out 1k
R2 out 0 1k
",
        );
        let v = operating_point(&mut circuit);
        assert!((v[circuit.output_node.index()] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn output_impedance_of_a_resistive_divider_matches_thevenin() {
        // Thevenin output resistance of a 1k/1k divider fed from an ideal
        // source is the parallel combination, 500 ohm.
        let mut circuit = build(
            "\
.input in
.output out
V1 in 0 0.0
R1 in out 1k
R2 out 0 1k
",
        );
        let z = output_impedance(&mut circuit, 48000.0, 1000.0, 1.0, 1e-3, 4);
        assert!((z - 500.0).abs() < 50.0, "z = {z}");
    }
}
