//! Queries over a solved circuit.
//!
//! All names are dotted paths from the top level: `out`, `x1.out`,
//! `x1.x2.R3`. Results are memoized per instance and never change the
//! solved state.

use indexmap::IndexMap;
use num_traits::Zero;
use symcirc_algebra::RationalFunction;

use crate::GROUND;
use crate::circuit::Circuit;
use crate::equation::{CurrentTrace, Row};
use crate::error::{InstanceError, Result};
use crate::instance::{Incident, InstanceId};
use crate::params::ParamMap;

/// A voltage or current relation expressed in an instance's port voltages:
/// `Σ coeffs·V(port) − rhs + Σ through·J(port)`, where `J(port)` is the
/// current leaving the instance through that port into its parent.
#[derive(Debug, Clone)]
pub struct PortRelation {
    pub coeffs: IndexMap<String, RationalFunction>,
    pub rhs: RationalFunction,
    pub through: IndexMap<String, RationalFunction>,
    /// Ports tied to the queried port by voltage-source chains.
    pub chained: Vec<String>,
}

impl Circuit {
    /// Evaluated parameters of the instance at `path`.
    pub fn evaluated_params(&self, path: &str) -> Result<&ParamMap> {
        Ok(self.instance(self.find_instance(path)?).params())
    }

    /// Voltage of net `a`, relative to net `b` or to ground.
    pub fn voltage(&self, a: &str, b: Option<&str>) -> Result<RationalFunction> {
        let (x, net) = self.resolve(a)?;
        let va = self.net_voltage(x, &net)?;
        match b {
            Some(b) => {
                let (y, net) = self.resolve(b)?;
                Ok(&va - &self.net_voltage(y, &net)?)
            }
            None => Ok(va),
        }
    }

    /// Current entering an element at its first net.
    pub fn current(&self, element: &str) -> Result<RationalFunction> {
        let (x, name) = self.resolve(element)?;
        if let Some(cached) = self.instance(x).current_cache.borrow().get(&name) {
            return Ok(cached.clone());
        }
        let ei = self
            .instance(x)
            .elements
            .get_index_of(&name)
            .ok_or_else(|| InstanceError::NoSuchElement {
                circuit: self.label(x),
                element: name.clone(),
            })?;
        let row = self.element_current(x, ei, &mut CurrentTrace::default())?;
        let value = self.evaluate_row(x, &row)?;
        self.instance(x)
            .current_cache
            .borrow_mut()
            .insert(name, value.clone());
        Ok(value)
    }

    /// Current flowing from the parent into a subinstance port, e.g.
    /// `x1.in`.
    pub fn sub_port_current(&self, port: &str) -> Result<RationalFunction> {
        let Some((path, port_name)) = port.rsplit_once(crate::circuit::SEPARATOR) else {
            return Err(InstanceError::TopLevelPort(port.to_string()));
        };
        let c = self.find_instance(path)?;
        let inst = self.instance(c);
        if !inst.is_port(port_name) {
            return Err(InstanceError::NoSuchPort {
                instance: path.to_string(),
                port: port_name.to_string(),
            });
        }
        let parent = inst
            .parent
            .ok_or_else(|| InstanceError::TopLevelPort(port.to_string()))?;
        let mut trace = CurrentTrace::default();
        let inner = self.kcl_row(c, port_name, &mut trace)?;
        let row = self.lift(c, &inner, &mut trace)?;
        self.evaluate_row(parent, &row)
    }

    /// Constraint of voltage-type `element` of the instance at `path`,
    /// re-expressed in that instance's port voltages.
    pub fn port_voltage(&self, path: &str, element: &str) -> Result<PortRelation> {
        let x = self.find_instance(path)?;
        let ei = self
            .instance(x)
            .elements
            .get_index_of(element)
            .ok_or_else(|| InstanceError::NoSuchElement {
                circuit: self.label(x),
                element: element.to_string(),
            })?;
        let row = self.constraint_row(x, ei, &mut CurrentTrace::default())?;
        Ok(self.port_relation(x, &self.reduce(x, &row)?, Vec::new()))
    }

    /// Current entering the instance at `path` through `port`, re-expressed
    /// in its port voltages.
    pub fn port_current(&self, path: &str, port: &str) -> Result<PortRelation> {
        let x = self.find_instance(path)?;
        let inst = self.instance(x);
        if !inst.is_port(port) {
            return Err(InstanceError::NoSuchPort {
                instance: path.to_string(),
                port: port.to_string(),
            });
        }
        let row = self.kcl_row(x, port, &mut CurrentTrace::default())?;
        let chained = inst.chained_ports(port).to_vec();
        Ok(self.port_relation(x, &self.reduce(x, &row)?, chained))
    }

    fn port_relation(&self, x: InstanceId, reduced: &Row, chained: Vec<String>) -> PortRelation {
        let inst = self.instance(x);
        PortRelation {
            coeffs: inst
                .ports
                .keys()
                .cloned()
                .zip(reduced.coeffs.iter().cloned())
                .collect(),
            rhs: reduced.rhs.clone(),
            through: reduced.open.iter().cloned().collect(),
            chained,
        }
    }

    /// Voltage of a net of instance `x`.
    pub(crate) fn net_voltage(&self, x: InstanceId, net: &str) -> Result<RationalFunction> {
        if x.is_root() && net == GROUND {
            return Ok(RationalFunction::zero());
        }
        let inst = self.instance(x);
        if let Some(v) = inst.voltage_cache.borrow().get(net) {
            return Ok(v.clone());
        }

        let value = if let Some(bound) = inst.ports.get(net) {
            let parent = inst
                .parent
                .ok_or_else(|| InstanceError::TopLevelPort(self.label(x)))?;
            self.net_voltage(parent, bound)?
        } else {
            let i = inst
                .net_index(net)
                .ok_or_else(|| InstanceError::NoSuchNet {
                    circuit: self.label(x),
                    net: net.to_string(),
                })?;
            let ap = inst
                .ap()
                .ok_or_else(|| InstanceError::NotSolved(self.label(x)))?;
            let mut v = inst.v0().map(|v0| v0[i].clone()).unwrap_or_else(RationalFunction::zero);
            for (j, port) in inst.port_nets().iter().enumerate() {
                let a = &ap[(i, j)];
                if !a.is_zero() {
                    v = &v + &(a * &self.net_voltage(x, port)?);
                }
            }
            v
        };

        inst.voltage_cache
            .borrow_mut()
            .insert(net.to_string(), value.clone());
        Ok(value)
    }

    /// Value of a row of `x`, resolving currents through its ports
    /// in the parent.
    pub(crate) fn evaluate_row(&self, x: InstanceId, row: &Row) -> Result<RationalFunction> {
        let inst = self.instance(x);
        let mut acc = -&row.rhs;
        for (j, c) in row.coeffs.iter().enumerate() {
            if !c.is_zero() {
                acc = &acc + &(c * &self.net_voltage(x, &inst.nets[j])?);
            }
        }
        for (port, scale) in &row.open {
            let parent = inst
                .parent
                .ok_or_else(|| InstanceError::TopLevelPort(self.label(x)))?;
            let bound = &inst.ports[port.as_str()];
            let far =
                self.far_side_current(parent, bound, Incident::Instance(x), &mut CurrentTrace::default())?;
            acc = &acc + &(scale * &self.evaluate_row(parent, &far)?);
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;

    fn int(n: i64) -> RationalFunction {
        RationalFunction::from_integer(n)
    }

    fn solved(top: &Template) -> Circuit {
        let mut circuit = Circuit::new(top).unwrap();
        circuit.solve().unwrap();
        circuit
    }

    #[test]
    fn test_voltage_difference() {
        let mut top = Template::new("top");
        top.element("V1", "a 0 6").unwrap();
        top.element("R1", "a b 1").unwrap();
        top.element("R2", "b 0 2").unwrap();
        let circuit = solved(&top);
        assert_eq!(circuit.voltage("b", None).unwrap(), int(4));
        assert_eq!(circuit.voltage("a", Some("b")).unwrap(), int(2));
        assert_eq!(circuit.voltage("0", None).unwrap(), int(0));
    }

    #[test]
    fn test_unknown_net() {
        let mut top = Template::new("top");
        top.element("V1", "a 0 1").unwrap();
        top.element("R1", "a 0 1").unwrap();
        let circuit = solved(&top);
        assert!(matches!(
            circuit.voltage("zz", None),
            Err(InstanceError::NoSuchNet { .. })
        ));
        assert!(matches!(
            circuit.voltage("x1.a", None),
            Err(InstanceError::NoSuchInstance { .. })
        ));
        assert!(matches!(
            circuit.current("R9"),
            Err(InstanceError::NoSuchElement { .. })
        ));
    }

    #[test]
    fn test_source_current_direction() {
        // 1 V across 1 ohm: 1 A leaves the source at its positive terminal,
        // so the current entering V1 at `a` is -1.
        let mut top = Template::new("top");
        top.element("V1", "a 0 1").unwrap();
        top.element("R1", "a 0 1").unwrap();
        let circuit = solved(&top);
        assert_eq!(circuit.current("R1").unwrap(), int(1));
        assert_eq!(circuit.current("V1").unwrap(), int(-1));
    }

    #[test]
    fn test_sub_port_current() {
        let mut load = Template::subcircuit("load", &["p", "g"]);
        load.element("R1", "p g 4").unwrap();
        let mut top = Template::new("top");
        top.add_subcircuit(load).unwrap();
        top.element("V1", "a 0 8").unwrap();
        top.element("x1", "a 0 load").unwrap();
        let circuit = solved(&top);
        assert_eq!(circuit.sub_port_current("x1.p").unwrap(), int(2));
        assert_eq!(circuit.sub_port_current("x1.g").unwrap(), int(-2));
        assert!(matches!(
            circuit.sub_port_current("p"),
            Err(InstanceError::TopLevelPort(_))
        ));
        assert!(matches!(
            circuit.sub_port_current("x1.q"),
            Err(InstanceError::NoSuchPort { .. })
        ));
    }

    #[test]
    fn test_port_relations() {
        let mut sub = Template::subcircuit("shift", &["a", "b"]);
        sub.element("V1", "b a 3").unwrap();
        let mut top = Template::new("top");
        top.add_subcircuit(sub).unwrap();
        top.element("V1", "n 0 1").unwrap();
        top.element("x1", "n m shift").unwrap();
        top.element("R1", "m 0 1").unwrap();
        let circuit = solved(&top);

        let v = circuit.port_voltage("x1", "V1").unwrap();
        assert_eq!(v.coeffs["b"], int(1));
        assert_eq!(v.coeffs["a"], int(-1));
        assert_eq!(v.rhs, int(3));

        let i = circuit.port_current("x1", "a").unwrap();
        assert_eq!(i.chained, vec!["b".to_string()]);
        assert_eq!(i.through["b"], int(1));

        assert_eq!(circuit.voltage("m", None).unwrap(), int(4));
        // 4 A flows out of x1 at b into R1, so 4 A enters at a.
        assert_eq!(circuit.sub_port_current("x1.a").unwrap(), int(4));
    }

    #[test]
    fn test_unsolved_query() {
        let mut top = Template::new("top");
        top.element("V1", "a 0 1").unwrap();
        top.element("R1", "a 0 1").unwrap();
        let circuit = Circuit::new(&top).unwrap();
        assert!(matches!(
            circuit.voltage("a", None),
            Err(InstanceError::NotSolved(_))
        ));
    }
}
