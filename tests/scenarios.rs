//! Whole-circuit scenario tests: build a netlist, drive it, and check the
//! result against known analytical or textbook behaviour.

use std::f64::consts::PI;

use approx::assert_relative_eq;

use pedaler_core::circuit::{validate_circuit, Circuit};
use pedaler_core::dsl;
use pedaler_core::solver::{operating_point, Simulator};

fn build(netlist: &str) -> Circuit {
    let ast = dsl::parse(netlist).expect("netlist should parse");
    let circuit = Circuit::from_ast(ast).expect("circuit should build");
    validate_circuit(&circuit).expect("circuit should validate");
    circuit
}

#[test]
fn rc_low_pass_attenuates_to_the_textbook_magnitude() {
    let netlist = r#"
        .input in
        .output out
        Vin in 0 0
        R1 in out 1k
        C1 out 0 100n
    "#;
    let circuit = build(netlist);

    let sample_rate = 192_000.0f32;
    let freq = 1000.0;
    let amplitude = 1.0;
    let mut sim = Simulator::new(circuit, sample_rate);

    let samples_per_cycle = (sample_rate as f64 / freq).round() as usize;
    let settle_cycles = 20;
    let measure_cycles = 5;
    let total = samples_per_cycle * (settle_cycles + measure_cycles);
    let measure_start = samples_per_cycle * settle_cycles;

    let mut peak = 0.0f64;
    for i in 0..total {
        let t = i as f64 / sample_rate as f64;
        sim.set_input((amplitude * (2.0 * PI * freq * t).sin()) as f32);
        let v = sim.step() as f64;
        if i >= measure_start {
            peak = peak.max(v.abs());
        }
    }

    let rc = 1000.0 * 100e-9;
    let omega = 2.0 * PI * freq;
    let expected = 1.0 / (1.0 + (omega * rc).powi(2)).sqrt();

    assert_relative_eq!(peak, expected, max_relative = 0.01);
}

#[test]
fn diode_half_wave_rectifier_clips_the_negative_half_cycle() {
    let netlist = r#"
        .input in
        .output out
        .model D1N4148 D (is=5.3e-9 n=1.68 vt=0.02585)
        Vin in 0 0
        D1 in out D1N4148
        R1 out 0 1k
    "#;
    let circuit = build(netlist);

    let sample_rate = 48_000.0f32;
    let freq = 60.0;
    let amplitude = 1.0;
    let mut sim = Simulator::new(circuit, sample_rate);

    let samples_per_cycle = (sample_rate as f64 / freq).round() as usize;
    let total = samples_per_cycle * 3;
    let measure_start = samples_per_cycle * 2;

    let mut positive_peak = 0.0f64;
    let mut negative_peak_mag = 0.0f64;
    for i in 0..total {
        let t = i as f64 / sample_rate as f64;
        let v_in = amplitude * (2.0 * PI * freq * t).sin();
        sim.set_input(v_in as f32);
        let v_out = sim.step() as f64;
        if i >= measure_start {
            if v_in >= 0.0 {
                positive_peak = positive_peak.max(v_out);
            } else {
                negative_peak_mag = negative_peak_mag.max(v_out.abs());
            }
        }
    }

    assert!(
        positive_peak > 0.4 && positive_peak < 0.65,
        "positive half-cycle peak out of range: {positive_peak}"
    );
    assert!(
        negative_peak_mag < 0.01,
        "negative half-cycle leaked through: {negative_peak_mag}"
    );
}

#[test]
fn bjt_common_emitter_dc_operating_point_matches_textbook_bias() {
    let netlist = r#"
        .input in
        .output vc
        Vin in 0 0
        Rin in 0 1k
        Vcc vcc 0 9
        R1 vcc vb 68k
        R2 vb 0 12k
        Rc vcc vc 10k
        Q1 vc vb ve
        Re ve 0 1k
    "#;
    let mut circuit = build(netlist);

    let vb_node = circuit.find_node("vb").unwrap();
    let ve_node = circuit.find_node("ve").unwrap();
    let vc_node = circuit.find_node("vc").unwrap();
    let vcc_node = circuit.find_node("vcc").unwrap();

    let voltages = operating_point(&mut circuit);
    let vbe = voltages[vb_node.index()] - voltages[ve_node.index()];
    let ic = (voltages[vcc_node.index()] - voltages[vc_node.index()]) / 10_000.0;

    assert_relative_eq!(vbe, 0.65, max_relative = 0.1);
    assert_relative_eq!(ic, 0.65e-3, max_relative = 0.25);
}

#[test]
fn opamp_inverting_amplifier_tracks_closed_loop_gain_and_saturates() {
    let netlist = r#"
        .input in
        .output out
        Vin in 0 0
        Vcc vcc 0 9
        Vee vee 0 -9
        O1 out 0 ninv vcc vee
        Rin in ninv 1k
        Rf ninv out 10k
    "#;
    let circuit = build(netlist);
    let mut sim = Simulator::new(circuit, 48_000.0);

    // Closed-loop gain is -Rf/Rin = -10; a -100 mV input therefore produces
    // +1.0 V at the output.
    let mut v_out = 0.0f32;
    for _ in 0..8 {
        sim.set_input(-0.1);
        v_out = sim.step();
    }
    assert_relative_eq!(v_out as f64, 1.0, max_relative = 0.02);

    // Driving the same inverting stage hard with -2 V overdrives the ideal
    // target to +20 V, saturating at the positive headroom bound
    // (Vcc - hd, hd = 0.5 V for an 18 V rail span).
    let mut v_sat = 0.0f32;
    for _ in 0..8 {
        sim.set_input(-2.0);
        v_sat = sim.step();
    }
    let v_sat = v_sat as f64;
    assert!(
        v_sat > 8.0 && v_sat < 9.0,
        "expected output clamped near the +8.5 V headroom bound, got {v_sat}"
    );
}

#[test]
fn capacitor_initial_condition_discharges_to_the_rc_time_constant() {
    let netlist = r#"
        .input in
        .output out
        Vin in 0 0
        Rin in 0 1k
        .ic C1 5
        C1 out 0 1u
        R1 out 0 1000000
    "#;
    let circuit = build(netlist);
    let sample_rate = 48_000.0f32;
    let mut sim = Simulator::new(circuit, sample_rate);

    let rc = 1e-6 * 1_000_000.0;
    let total_samples = (rc * sample_rate as f64).round() as usize;

    let mut v_out = 5.0f32;
    for _ in 0..total_samples {
        sim.set_input(0.0);
        v_out = sim.step();
    }

    let expected = 5.0 * (-1.0f64).exp();
    assert_relative_eq!(v_out as f64, expected, max_relative = 0.01);
}

#[test]
fn potentiometer_sweep_linear_taper_is_linear_in_the_parameter() {
    let netlist = r#"
        .input in
        .output wiper
        Vin in 0 0
        Rin in 0 1k
        Vtop n1 0 1.0
        P1 n1 0 wiper 10k taper=LIN param=pos
    "#;
    let circuit = build(netlist);
    let mut sim = Simulator::new(circuit, 48_000.0);

    for &p in &[0.0, 0.25, 0.5, 0.75, 1.0] {
        sim.circuit_mut().registry.set("pos", p);
        sim.set_input(0.0);
        let v_wiper = sim.step() as f64;
        assert_relative_eq!(v_wiper, p, epsilon = 0.01);
    }
}

#[test]
fn potentiometer_sweep_log_taper_is_proportional_to_param_to_the_fifth() {
    let netlist = r#"
        .input in
        .output wiper
        Vin in 0 0
        Rin in 0 1k
        Vtop n1 0 1.0
        P1 n1 0 wiper 10k taper=LOG param=pos
    "#;
    let circuit = build(netlist);
    let mut sim = Simulator::new(circuit, 48_000.0);

    for &p in &[0.2, 0.4, 0.6, 0.8, 1.0] {
        sim.circuit_mut().registry.set("pos", p);
        sim.set_input(0.0);
        let v_wiper = sim.step() as f64;
        assert_relative_eq!(v_wiper, p.powi(5), epsilon = 0.01);
    }
}
