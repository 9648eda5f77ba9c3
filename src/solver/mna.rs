//! MNA matrix assembly and solving.
//!
//! The system is kept purely nodal: every source is modelled as a Norton
//! equivalent, so there are no auxiliary branch-current unknowns and the
//! matrix is exactly `num_nodes` square, ground included as row/column 0.

use crate::circuit::NodeId;
use log::warn;

/// Pivot magnitude floor. Below this, the pivot is substituted rather than
/// treated as singular — a near-singular factor is a warning, not an abort.
const PIVOT_FLOOR: f64 = 1e-20;

/// MNA matrix system Ax = z, ground-included.
#[derive(Debug)]
pub struct MnaMatrix {
    /// System matrix G (row-major), `size` x `size`.
    pub a: Vec<f64>,
    /// Source vector I.
    pub z: Vec<f64>,
    /// Solution vector V.
    pub x: Vec<f64>,
    /// Matrix dimension (== num_nodes, ground included).
    pub size: usize,
    /// LU decomposition of A.
    pub lu: Vec<f64>,
    /// Pivot indices for the LU decomposition.
    pub pivots: Vec<usize>,
    /// Set when the most recent `factor()` had to floor a pivot.
    pub near_singular: bool,
}

impl MnaMatrix {
    /// Create a new ground-included MNA matrix for `num_nodes` nodes.
    pub fn new(num_nodes: usize) -> Self {
        Self {
            a: vec![0.0; num_nodes * num_nodes],
            z: vec![0.0; num_nodes],
            x: vec![0.0; num_nodes],
            size: num_nodes,
            lu: vec![0.0; num_nodes * num_nodes],
            pivots: vec![0; num_nodes],
            near_singular: false,
        }
    }

    /// Clear the matrix and source vector to zero. The solution vector `x`
    /// (the current NR iterate) is left untouched.
    pub fn clear(&mut self) {
        self.a.fill(0.0);
        self.z.fill(0.0);
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.a[row * self.size + col]
    }

    /// Set matrix element at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] = value;
    }

    /// Accumulate into matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] += value;
    }

    /// Accumulate into the source vector.
    pub fn add_source(&mut self, row: usize, value: f64) {
        self.z[row] += value;
    }

    /// Stamp a conductance between two nodes, skipping ground per the
    /// "ground contributions are discarded" stamp contract.
    pub fn stamp_conductance(&mut self, n1: NodeId, n2: NodeId, g: f64) {
        if !n1.is_ground() {
            self.add(n1.index(), n1.index(), g);
        }
        if !n2.is_ground() {
            self.add(n2.index(), n2.index(), g);
        }
        if !n1.is_ground() && !n2.is_ground() {
            self.add(n1.index(), n2.index(), -g);
            self.add(n2.index(), n1.index(), -g);
        }
    }

    /// Stamp a Norton-equivalent two-terminal source: conductance `g` in
    /// parallel with a current source injecting `i` from `n1` to `n2`.
    pub fn stamp_norton_source(&mut self, n1: NodeId, n2: NodeId, g: f64, i: f64) {
        self.stamp_conductance(n1, n2, g);
        if !n1.is_ground() {
            self.add_source(n1.index(), i);
        }
        if !n2.is_ground() {
            self.add_source(n2.index(), -i);
        }
    }

    /// Stamp a VCCS: current `gm * (V[ctrl+] - V[ctrl-])` flows from
    /// `out_pos` to `out_neg`.
    pub fn stamp_vccs(&mut self, out_pos: NodeId, out_neg: NodeId, ctrl_pos: NodeId, ctrl_neg: NodeId, gm: f64) {
        if !out_pos.is_ground() && !ctrl_pos.is_ground() {
            self.add(out_pos.index(), ctrl_pos.index(), gm);
        }
        if !out_pos.is_ground() && !ctrl_neg.is_ground() {
            self.add(out_pos.index(), ctrl_neg.index(), -gm);
        }
        if !out_neg.is_ground() && !ctrl_pos.is_ground() {
            self.add(out_neg.index(), ctrl_pos.index(), -gm);
        }
        if !out_neg.is_ground() && !ctrl_neg.is_ground() {
            self.add(out_neg.index(), ctrl_neg.index(), gm);
        }
    }

    /// Pin the ground row/column: row 0 and column 0 become `e0`, `I[0] = 0`.
    /// Run once, last, after every device has stamped.
    pub fn pin_ground(&mut self) {
        let n = self.size;
        for j in 0..n {
            self.set(0, j, 0.0);
        }
        for i in 0..n {
            self.set(i, 0, 0.0);
        }
        self.set(0, 0, 1.0);
        self.z[0] = 0.0;
    }

    /// Partial-pivot LU decomposition. A near-singular pivot is floored to
    /// `PIVOT_FLOOR` and the caller is notified via `near_singular`, rather
    /// than the factorisation aborting.
    pub fn factor(&mut self) {
        let n = self.size;
        self.lu.copy_from_slice(&self.a);
        self.near_singular = false;

        for i in 0..n {
            self.pivots[i] = i;
        }

        for k in 0..n {
            let mut max_val = self.lu[k * n + k].abs();
            let mut max_row = k;

            for i in (k + 1)..n {
                let val = self.lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_row != k {
                self.pivots.swap(k, max_row);
                for j in 0..n {
                    self.lu.swap(k * n + j, max_row * n + j);
                }
            }

            if self.lu[k * n + k].abs() < PIVOT_FLOOR {
                warn!(
                    "near-singular pivot at row {k} (|pivot| < {PIVOT_FLOOR:e}); flooring instead of aborting"
                );
                let sign = if self.lu[k * n + k] < 0.0 { -1.0 } else { 1.0 };
                self.lu[k * n + k] = sign * PIVOT_FLOOR;
                self.near_singular = true;
            }

            let pivot = self.lu[k * n + k];
            for i in (k + 1)..n {
                let factor = self.lu[i * n + k] / pivot;
                self.lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    self.lu[i * n + j] -= factor * self.lu[k * n + j];
                }
            }
        }
    }

    /// Solve the system using the precomputed LU decomposition, writing the
    /// result into `self.x`.
    pub fn solve(&mut self) {
        let n = self.size;

        let b = self.z.clone();
        for i in 0..n {
            self.x[i] = b[self.pivots[i]];
        }

        for i in 0..n {
            for j in 0..i {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
        }

        for i in (0..n).rev() {
            for j in (i + 1)..n {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
            let mut diag = self.lu[i * n + i];
            if diag.abs() < PIVOT_FLOOR {
                diag = if diag < 0.0 { -PIVOT_FLOOR } else { PIVOT_FLOOR };
            }
            self.x[i] /= diag;
        }
    }

    /// Voltage at a node in the current solution vector.
    pub fn voltage(&self, node: NodeId) -> f64 {
        self.x[node.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_is_pinned_after_stamping() {
        let mut m = MnaMatrix::new(3);
        m.stamp_conductance(NodeId(0), NodeId(1), 1.0);
        m.stamp_conductance(NodeId(1), NodeId(2), 1.0);
        m.pin_ground();
        assert_eq!(m.get(0, 0), 1.0);
        assert_eq!(m.get(0, 1), 0.0);
        assert_eq!(m.get(1, 0), 0.0);
        assert_eq!(m.z[0], 0.0);
    }

    #[test]
    fn resistive_divider_solves() {
        // 1V source (Norton) at node 1 w/ 1ohm series, 1k to ground at node 1,
        // 1k from node1 to node2, node2 grounded via 1k.
        let mut m = MnaMatrix::new(3);
        m.stamp_norton_source(NodeId(1), NodeId(0), 1.0, 1.0); // 1A into node1 w/ 1S to gnd
        m.stamp_conductance(NodeId(1), NodeId(2), 1.0);
        m.stamp_conductance(NodeId(2), NodeId(0), 1.0);
        m.pin_ground();
        m.factor();
        m.solve();
        assert_eq!(m.voltage(NodeId(0)), 0.0);
        // node1 has 2 conductances to gnd-equivalent network; just check finite/plausible.
        assert!(m.voltage(NodeId(1)).is_finite());
    }
}
