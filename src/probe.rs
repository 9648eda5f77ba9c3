//! CSV probe writer: records `.probe` targets to a semicolon-separated log,
//! one row per converged sample.
//!
//! An external collaborator in the original design; kept here as a thin,
//! dependency-free writer over the interfaces the core solver exposes
//! (`Circuit`'s resolved probes, `MnaMatrix`'s solved voltages).

use std::io::{self, Write};

use crate::circuit::{Circuit, ProbeTarget};
use crate::components::Component;
use crate::solver::MnaMatrix;

/// Writes the probe CSV header and one row per sample.
pub struct ProbeWriter<W: Write> {
    out: W,
    header_written: bool,
}

impl<W: Write> ProbeWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
        }
    }

    /// Write the header row (`time;V(node);I(comp);...`) if not already
    /// written.
    pub fn write_header(&mut self, circuit: &Circuit) -> io::Result<()> {
        if self.header_written {
            return Ok(());
        }
        write!(self.out, "time")?;
        for probe in &circuit.probes {
            write!(self.out, ";{}", probe.label)?;
        }
        writeln!(self.out)?;
        self.header_written = true;
        Ok(())
    }

    /// Write one sample's row: nine fractional digits on time, `NaN` for
    /// any probe that failed to resolve against the circuit.
    pub fn write_sample(&mut self, circuit: &Circuit, matrix: &MnaMatrix, t: f64) -> io::Result<()> {
        if !self.header_written {
            self.write_header(circuit)?;
        }
        write!(self.out, "{t:.9}")?;
        for probe in &circuit.probes {
            let value = match probe.target {
                ProbeTarget::Voltage(Some(node)) => matrix.voltage(node),
                ProbeTarget::Voltage(None) => f64::NAN,
                ProbeTarget::Current(Some(idx)) => {
                    component_current(&circuit.components[idx], &matrix.x, matrix.size).unwrap_or(f64::NAN)
                }
                ProbeTarget::Current(None) => f64::NAN,
            };
            write!(self.out, ";{value}")?;
        }
        writeln!(self.out)?;
        Ok(())
    }
}

/// Current flowing from a two-terminal device's first node to its second,
/// computed from the already-converged solution. `None` for devices with
/// no well-defined terminal current (voltage sources, behavioural sources,
/// meta-devices).
fn component_current(component: &Component, v: &[f64], _size: usize) -> Option<f64> {
    match component {
        Component::Resistor(r) => {
            let g = 1.0 / r.resistance;
            Some(g * (v[r.nodes[0].index()] - v[r.nodes[1].index()]))
        }
        Component::Inductor(l) => Some(l.i_prev),
        Component::Diode(d) => Some(d.get_current(v)),
        Component::Bjt(q) => Some(q.get_current(v)),
        Component::Mosfet(m) => Some(m.get_current(v)),
        Component::Switch(s) => {
            let g = s.conductance();
            Some(g * (v[s.nodes[0].index()] - v[s.nodes[1].index()]))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;
    use crate::solver::{MnaMatrix, NewtonRaphson};

    #[test]
    fn writes_header_and_a_row() {
        let ast = parse(
            "\
.input in
.output out
.probe V(out)
.probe I(R1)
V1 in 0 1.0
R1 in out 1k
R2 out 0 1k
",
        )
        .unwrap();
        let mut circuit = Circuit::from_ast(ast).unwrap();
        let mut matrix = MnaMatrix::new(circuit.matrix_size());
        let mut nr = NewtonRaphson::new();
        nr.solve(&mut circuit, &mut matrix, 1.0 / 48000.0, 0.0);

        let mut buf = Vec::new();
        let mut writer = ProbeWriter::new(&mut buf);
        writer.write_sample(&circuit, &matrix, 0.0).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("time;V(out);I(R1)\n"));
        assert!(text.lines().nth(1).unwrap().starts_with("0.000000000;"));
    }

    #[test]
    fn unresolved_probe_renders_nan() {
        let ast = parse(
            "\
.input in
.output out
.probe V(nonexistent)
V1 in 0 1.0
R1 in out 1k
R2 out 0 1k
",
        )
        .unwrap();
        let circuit = Circuit::from_ast(ast).unwrap();
        let matrix = MnaMatrix::new(circuit.matrix_size());

        let mut buf = Vec::new();
        let mut writer = ProbeWriter::new(&mut buf);
        writer.write_sample(&circuit, &matrix, 0.0).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.lines().nth(1).unwrap().ends_with(";NaN"));
    }
}
