//! Equation assembly.
//!
//! Every equation is a [`Row`] over the nets of one instance. Current rows
//! use the convention "current leaving = G·V − I". Currents that leave an
//! instance through a port into its parent cannot be expressed in the
//! instance's own nets; they are carried as open ports and resolved against
//! the parent's current balance when the row is lifted or evaluated.

use std::collections::HashSet;

use num_traits::{One, Zero};
use symcirc_algebra::RationalFunction;

use crate::circuit::Circuit;
use crate::element::ElementKind;
use crate::error::{InstanceError, Result};
use crate::instance::{Incident, InstanceId};

/// Linear expression `Σ coeffs·V − rhs + Σ scale·J(port)` over the nets of
/// an instance, where `J(port)` is the current flowing out of the instance
/// through `port` into the parent.
#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub(crate) coeffs: Vec<RationalFunction>,
    pub(crate) rhs: RationalFunction,
    pub(crate) open: Vec<(String, RationalFunction)>,
}

impl Row {
    pub(crate) fn zeros(n: usize) -> Self {
        Self {
            coeffs: vec![RationalFunction::zero(); n],
            rhs: RationalFunction::zero(),
            open: Vec::new(),
        }
    }

    pub(crate) fn add_scaled(&mut self, other: &Row, k: &RationalFunction) {
        if k.is_zero() {
            return;
        }
        for (c, o) in self.coeffs.iter_mut().zip(&other.coeffs) {
            if !o.is_zero() {
                *c = &*c + &(o * k);
            }
        }
        self.rhs = &self.rhs + &(&other.rhs * k);
        for (port, scale) in &other.open {
            self.add_open(port, &(scale * k));
        }
    }

    pub(crate) fn add(&mut self, other: &Row) {
        self.add_scaled(other, &RationalFunction::one());
    }

    pub(crate) fn scaled(&self, k: &RationalFunction) -> Row {
        let mut out = Row::zeros(self.coeffs.len());
        out.add_scaled(self, k);
        out
    }

    pub(crate) fn add_open(&mut self, port: &str, scale: &RationalFunction) {
        match self.open.iter_mut().find(|(p, _)| p == port) {
            Some((_, s)) => *s = &*s + scale,
            None => self.open.push((port.to_string(), scale.clone())),
        }
        self.open.retain(|(_, s)| !s.is_zero());
    }
}

/// State threaded through one current computation.
#[derive(Debug, Default)]
pub(crate) struct CurrentTrace {
    /// Nets whose far-side balance is being expanded.
    far_visited: HashSet<(InstanceId, String)>,
    /// Current-controlled sources whose control current is being expanded,
    /// with the accumulated self-reference gain.
    cccs: Vec<(InstanceId, usize, RationalFunction)>,
}

impl Circuit {
    pub(crate) fn net_count(&self, x: InstanceId) -> usize {
        self.instance(x).nets.len()
    }

    /// Add `value` to the coefficient of `net`; the top-level ground is dropped.
    pub(crate) fn add_net(&self, row: &mut Row, x: InstanceId, net: &str, value: &RationalFunction) {
        if let Some(i) = self.instance(x).net_index(net) {
            row.coeffs[i] = &row.coeffs[i] + value;
        }
    }

    fn parent_of(&self, x: InstanceId) -> Result<InstanceId> {
        self.instance(x)
            .parent
            .ok_or_else(|| InstanceError::TopLevelPort(self.label(x)))
    }

    /// Current leaving `net` into one incident element or child instance.
    pub(crate) fn leaving_current(
        &self,
        x: InstanceId,
        net: &str,
        incident: Incident,
        trace: &mut CurrentTrace,
    ) -> Result<Row> {
        let n = self.net_count(x);
        let ei = match incident {
            Incident::Element(ei) => ei,
            Incident::Instance(c) => {
                let inst = self.instance(c);
                let mut row = Row::zeros(n);
                for (port, bound) in &inst.ports {
                    if bound == net {
                        let inner = self.kcl_row(c, port, trace)?;
                        row.add(&self.lift(c, &inner, trace)?);
                    }
                }
                return Ok(row);
            }
        };

        let element = &self.instance(x).elements[ei];
        let mut row = Row::zeros(n);
        let Some(sign) = element.output_sign(net) else {
            return Ok(row);
        };
        let sign = RationalFunction::from_integer(sign);

        match element.kind() {
            ElementKind::Resistor | ElementKind::Capacitor | ElementKind::Inductor => {
                let (p, m) = element.outputs();
                if let Some(y) = element.admittance() {
                    let y = &sign * y;
                    self.add_net(&mut row, x, p, &y);
                    self.add_net(&mut row, x, m, &-&y);
                }
            }
            ElementKind::CurrentSource => {
                row.rhs = &sign * element.value();
            }
            ElementKind::Vccs => {
                if let Some((cp, cm)) = element.control_nets() {
                    let gm = &sign * element.value();
                    self.add_net(&mut row, x, cp, &-&gm);
                    self.add_net(&mut row, x, cm, &gm);
                }
            }
            ElementKind::Cccs => {
                let gain = &sign * element.value();
                return self.controlled_current(x, ei, gain, trace);
            }
            ElementKind::VoltageSource | ElementKind::Vcvs | ElementKind::Ccvs => {
                if let Some(other) = element.other_output(net) {
                    return self.far_side_current(x, other, incident, trace);
                }
            }
        }
        Ok(row)
    }

    /// `gain` times the control current of the current-controlled source
    /// `ei`, with self references folded into `gain / (1 - k)`.
    fn controlled_current(
        &self,
        x: InstanceId,
        ei: usize,
        gain: RationalFunction,
        trace: &mut CurrentTrace,
    ) -> Result<Row> {
        let element = &self.instance(x).elements[ei];
        if let Some(pos) = trace.cccs.iter().position(|(i, e, _)| *i == x && *e == ei) {
            if pos + 1 != trace.cccs.len() {
                return Err(InstanceError::CircularCurrent(
                    self.qualified(x, element.name()),
                ));
            }
            let k = &mut trace.cccs[pos].2;
            *k = &*k + &gain;
            return Ok(Row::zeros(self.net_count(x)));
        }

        let control = element.control().unwrap_or_default();
        let reference = self
            .instance(x)
            .elements
            .get_index_of(control)
            .ok_or_else(|| InstanceError::NoSuchElement {
                circuit: self.label(x),
                element: control.to_string(),
            })?;

        trace.cccs.push((x, ei, RationalFunction::zero()));
        let saved = std::mem::take(&mut trace.far_visited);
        let current = self.element_current(x, reference, trace);
        trace.far_visited = saved;
        let k = trace
            .cccs
            .pop()
            .map(|(_, _, k)| k)
            .unwrap_or_else(RationalFunction::zero);
        let current = current?;

        let denominator = &RationalFunction::one() - &k;
        let factor = gain.checked_div(&denominator).map_err(|_| {
            InstanceError::IllConditionedSource(self.qualified(x, element.name()))
        })?;
        Ok(current.scaled(&factor))
    }

    /// Current flowing out of `net` into everything except `exclude`, plus
    /// the current leaving through `net` into the parent when it is a port.
    pub(crate) fn far_side_current(
        &self,
        x: InstanceId,
        net: &str,
        exclude: Incident,
        trace: &mut CurrentTrace,
    ) -> Result<Row> {
        let key = (x, net.to_string());
        if !trace.far_visited.insert(key.clone()) {
            return Err(InstanceError::CircularCurrent(self.qualified(x, net)));
        }
        let result = self.sum_leaving(x, net, Some(exclude), trace);
        trace.far_visited.remove(&key);

        let mut row = result?;
        if self.instance(x).is_port(net) {
            row.add_open(net, &RationalFunction::one());
        }
        Ok(row)
    }

    /// Current balance of `net` over everything inside the instance.
    pub(crate) fn kcl_row(&self, x: InstanceId, net: &str, trace: &mut CurrentTrace) -> Result<Row> {
        self.sum_leaving(x, net, None, trace)
    }

    fn sum_leaving(
        &self,
        x: InstanceId,
        net: &str,
        exclude: Option<Incident>,
        trace: &mut CurrentTrace,
    ) -> Result<Row> {
        let mut row = Row::zeros(self.net_count(x));
        let incidents = match self.instance(x).incidence.get(net) {
            Some(list) => list.as_slice(),
            None => &[],
        };
        for &incident in incidents {
            if Some(incident) == exclude {
                continue;
            }
            row.add(&self.leaving_current(x, net, incident, trace)?);
        }
        Ok(row)
    }

    /// Current entering element `ei` at its first net.
    pub(crate) fn element_current(
        &self,
        x: InstanceId,
        ei: usize,
        trace: &mut CurrentTrace,
    ) -> Result<Row> {
        let element = &self.instance(x).elements[ei];
        let (p, _) = element.outputs();
        self.leaving_current(x, p, Incident::Element(ei), trace)
    }

    /// Re-express a row of `x` in its port voltages using `Ap` and `V0`.
    /// The result has one coefficient per port.
    pub(crate) fn reduce(&self, x: InstanceId, row: &Row) -> Result<Row> {
        let inst = self.instance(x);
        let reduction = inst
            .reduction
            .as_ref()
            .ok_or_else(|| InstanceError::NotSolved(self.label(x)))?;
        let ni = inst.inner_count;
        let np = inst.ports.len();

        let mut out = Row::zeros(np);
        for j in 0..np {
            out.coeffs[j] = row.coeffs[ni + j].clone();
        }
        out.rhs = row.rhs.clone();
        out.open = row.open.clone();
        for i in 0..ni {
            let c = &row.coeffs[i];
            if c.is_zero() {
                continue;
            }
            for j in 0..np {
                let a = &reduction.ap[(i, j)];
                if !a.is_zero() {
                    out.coeffs[j] = &out.coeffs[j] + &(c * a);
                }
            }
            out.rhs = &out.rhs - &(c * &reduction.v0[i]);
        }
        Ok(out)
    }

    /// Move a row of `x` into its parent's nets, resolving currents that
    /// leave `x` through its ports against the parent's current balance.
    pub(crate) fn lift(&self, x: InstanceId, row: &Row, trace: &mut CurrentTrace) -> Result<Row> {
        let reduced = self.reduce(x, row)?;
        let parent = self.parent_of(x)?;
        let inst = self.instance(x);

        let mut out = Row::zeros(self.net_count(parent));
        out.rhs = reduced.rhs.clone();
        for (j, bound) in inst.ports.values().enumerate() {
            self.add_net(&mut out, parent, bound, &reduced.coeffs[j]);
        }
        for (port, scale) in &reduced.open {
            let bound = &inst.ports[port.as_str()];
            let far = self.far_side_current(parent, bound, Incident::Instance(x), trace)?;
            out.add_scaled(&far, scale);
        }
        Ok(out)
    }

    /// Lift a row from `from` up to its ancestor `ctx`.
    fn lift_to(
        &self,
        from: InstanceId,
        ctx: InstanceId,
        mut row: Row,
        trace: &mut CurrentTrace,
    ) -> Result<Row> {
        let mut cur = from;
        while cur != ctx {
            row = self.lift(cur, &row, trace)?;
            cur = self.parent_of(cur)?;
        }
        Ok(row)
    }

    /// Voltage equation of a voltage-type element.
    pub(crate) fn constraint_row(
        &self,
        x: InstanceId,
        ei: usize,
        trace: &mut CurrentTrace,
    ) -> Result<Row> {
        let element = &self.instance(x).elements[ei];
        let (p, m) = element.outputs();
        let mut row = Row::zeros(self.net_count(x));
        let one = RationalFunction::one();
        self.add_net(&mut row, x, p, &one);
        self.add_net(&mut row, x, m, &-&one);

        match element.kind() {
            ElementKind::VoltageSource => row.rhs = element.value().clone(),
            ElementKind::Vcvs => {
                if let Some((cp, cm)) = element.control_nets() {
                    let gain = element.value();
                    self.add_net(&mut row, x, cp, &-gain);
                    self.add_net(&mut row, x, cm, gain);
                }
            }
            ElementKind::Ccvs => {
                let control = element.control().unwrap_or_default();
                let reference = self
                    .instance(x)
                    .elements
                    .get_index_of(control)
                    .ok_or_else(|| InstanceError::NoSuchElement {
                        circuit: self.label(x),
                        element: control.to_string(),
                    })?;
                let current = self.element_current(x, reference, trace)?;
                row.add_scaled(&current, &-element.value());
            }
            _ => {}
        }
        Ok(row)
    }

    /// Find an unused voltage-type element that can supply the equation for
    /// `net`, following used sources to their other terminal, descending into
    /// child instances through ports and escalating to the parent while
    /// staying below `ctx`. The equation is returned in `ctx`'s nets.
    pub(crate) fn find_source(
        &mut self,
        x: InstanceId,
        net: &str,
        ctx: InstanceId,
        visited: &mut HashSet<(InstanceId, String)>,
    ) -> Result<Option<Row>> {
        if !visited.insert((x, net.to_string())) {
            return Ok(None);
        }

        let incidents = self
            .instance(x)
            .incidence
            .get(net)
            .cloned()
            .unwrap_or_default();
        for incident in incidents {
            match incident {
                Incident::Element(ei) => {
                    let element = &self.instance(x).elements[ei];
                    if !element.is_voltage_type() || element.output_sign(net).is_none() {
                        continue;
                    }
                    let other = element.other_output(net).unwrap_or_default().to_string();
                    if self.instance(x).used_sources.contains(&ei) {
                        if let Some(row) = self.find_source(x, &other, ctx, visited)? {
                            return Ok(Some(row));
                        }
                    } else {
                        let mut trace = CurrentTrace::default();
                        let row = self.constraint_row(x, ei, &mut trace)?;
                        let row = self.lift_to(x, ctx, row, &mut trace)?;
                        self.instance_mut(x).used_sources.insert(ei);
                        return Ok(Some(row));
                    }
                }
                Incident::Instance(c) => {
                    let ports: Vec<String> = self
                        .instance(c)
                        .ports
                        .iter()
                        .filter(|(_, bound)| bound.as_str() == net)
                        .map(|(port, _)| port.clone())
                        .collect();
                    for port in ports {
                        if let Some(row) = self.find_source(c, &port, ctx, visited)? {
                            return Ok(Some(row));
                        }
                    }
                }
            }
        }

        if x != ctx {
            let inst = self.instance(x);
            if let (Some(parent), Some(bound)) = (inst.parent, inst.ports.get(net)) {
                let bound = bound.clone();
                return self.find_source(parent, &bound, ctx, visited);
            }
        }
        Ok(None)
    }
}
