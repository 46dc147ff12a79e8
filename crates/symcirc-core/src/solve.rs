//! Bottom-up port reduction.
//!
//! Each instance is solved for its inner nets as an affine function of its
//! port voltages, `V_inner = Ap·V_port + V0`, after all of its children.

use std::collections::HashSet;

use nalgebra::DMatrix;
use symcirc_algebra::{Error as AlgebraError, matrix};

use crate::circuit::Circuit;
use crate::equation::{CurrentTrace, Row};
use crate::error::{ElementError, InstanceError, SolveError};
use crate::instance::{InstanceId, Reduction};

impl Circuit {
    /// Validate connectivity and solve every instance.
    ///
    /// Resets all per-solve state first, so a circuit may be solved again.
    pub fn solve(&mut self) -> Result<(), SolveError> {
        let floating = self.nets_without_ground_path();
        if !floating.is_empty() {
            return Err(SolveError::GroundPath(floating));
        }
        let loops = self.voltage_loops();
        if !loops.is_empty() {
            return Err(SolveError::VoltageLoops(loops));
        }

        self.solve_instance(InstanceId::ROOT)?;
        log::info!("solved {} instances", self.len());
        Ok(())
    }

    fn solve_instance(&mut self, x: InstanceId) -> Result<(), SolveError> {
        let children: Vec<InstanceId> = self.instance(x).children.values().copied().collect();
        for child in children {
            self.solve_instance(child)?;
        }

        self.instance_mut(x).reset();
        let inner: Vec<String> = self.instance(x).inner_nets().to_vec();
        let ni = inner.len();
        let np = self.instance(x).ports.len();

        let mut rows: Vec<Row> = Vec::with_capacity(ni);
        for net in &inner {
            let mut visited = HashSet::new();
            let row = match self.find_source(x, net, x, &mut visited)? {
                Some(row) => row,
                None => self.kcl_row(x, net, &mut CurrentTrace::default())?,
            };
            if let Some((port, _)) = row.open.first() {
                return Err(InstanceError::UnresolvedSupernode {
                    circuit: self.label(x),
                    port: port.clone(),
                }
                .into());
            }
            rows.push(row);
        }

        // G_in·V_in + G_p·V_p = I  =>  V_in = G_in⁻¹·[−G_p | I]·[V_p; 1]
        let g_inner = DMatrix::from_fn(ni, ni, |i, j| rows[i].coeffs[j].clone());
        let rhs = DMatrix::from_fn(ni, np + 1, |i, j| {
            if j < np {
                -&rows[i].coeffs[ni + j]
            } else {
                rows[i].rhs.clone()
            }
        });
        let solution = matrix::solve(&g_inner, &rhs).map_err(|err| match err {
            AlgebraError::SingularMatrix => SolveError::Element(ElementError::IllConditioned(
                self.label(x),
            )),
            other => SolveError::Instance(InstanceError::Algebra {
                circuit: self.label(x),
                source: other,
            }),
        })?;

        let ap = solution.columns(0, np).into_owned();
        let v0 = solution.column(np).into_owned();
        log::debug!(
            "solved {}: {} inner nets, {} ports",
            self.label(x),
            ni,
            np
        );
        self.instance_mut(x).reduction = Some(Reduction { ap, v0 });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;
    use symcirc_algebra::RationalFunction;

    #[test]
    fn test_shapes_match_nets() {
        let mut div = Template::subcircuit("div", &["in", "out"]);
        div.symbols(&["R1", "R2"]);
        div.element("R1", "in mid R1").unwrap();
        div.element("R2", "mid out R2").unwrap();
        div.element("R3", "out 0 1").unwrap();
        let mut top = Template::new("top");
        top.add_subcircuit(div).unwrap();
        top.element("V1", "a 0 1").unwrap();
        top.element("x1", "a b div").unwrap();
        top.element("RL", "b 0 1").unwrap();

        let mut circuit = Circuit::new(&top).unwrap();
        circuit.solve().unwrap();

        for (_, inst) in circuit.instances() {
            let ap = inst.ap().unwrap();
            let v0 = inst.v0().unwrap();
            assert_eq!(ap.nrows(), inst.inner_nets().len());
            assert_eq!(ap.ncols(), inst.port_nets().len());
            assert_eq!(v0.len(), inst.inner_nets().len());
        }
    }

    #[test]
    fn test_divider_reduction() {
        let mut div = Template::subcircuit("div", &["in", "out"]);
        div.symbols(&["R1", "R2"]);
        div.element("R1", "in mid R1").unwrap();
        div.element("R2", "mid 0 R2").unwrap();
        div.element("Rx", "mid out 1").unwrap();
        let mut top = Template::new("top");
        top.add_subcircuit(div).unwrap();
        top.element("V1", "a 0 1").unwrap();
        top.element("x1", "a b div").unwrap();
        top.element("RL", "b 0 1").unwrap();
        let mut circuit = Circuit::new(&top).unwrap();
        circuit.solve().unwrap();

        let x1 = circuit.instance(circuit.find_instance("x1").unwrap());
        // The local ground is an ordinary inner net.
        assert_eq!(x1.inner_nets(), ["mid", "0"]);
        assert!(x1.is_solved());
    }

    #[test]
    fn test_singular_inner_block() {
        // Zero-valued capacitors leave the middle net without an equation.
        let mut top = Template::new("top");
        top.element("V1", "a 0 1").unwrap();
        top.element("C1", "a m 0").unwrap();
        top.element("C2", "m 0 0").unwrap();
        let mut circuit = Circuit::new(&top).unwrap();
        let err = circuit.solve().unwrap_err();
        assert!(matches!(err, SolveError::Element(ElementError::IllConditioned(_))));
    }

    #[test]
    fn test_resolve_resets_state() {
        let mut top = Template::new("top");
        top.symbols(&["R"]);
        top.element("V1", "a 0 1").unwrap();
        top.element("R1", "a b R").unwrap();
        top.element("R2", "b 0 R").unwrap();
        let mut circuit = Circuit::new(&top).unwrap();
        circuit.solve().unwrap();
        let first = circuit.root().v0().unwrap().clone();
        circuit.solve().unwrap();
        assert_eq!(circuit.root().v0().unwrap(), &first);
        assert_eq!(
            circuit.root().v0().unwrap()[1],
            &RationalFunction::from_integer(1) / &RationalFunction::from_integer(2)
        );
    }
}
