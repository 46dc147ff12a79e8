//! Instantiated (sub)circuits.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use nalgebra::{DMatrix, DVector};
use symcirc_algebra::RationalFunction;

use crate::GROUND;
use crate::element::Element;
use crate::params::ParamMap;

/// Index of an instance in its [`Circuit`](crate::Circuit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) usize);

impl InstanceId {
    /// The top-level instance.
    pub const ROOT: InstanceId = InstanceId(0);

    pub fn index(self) -> usize {
        self.0
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

/// Something attached to a net: an element or a child instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Incident {
    /// Index into [`Instance::elements`].
    Element(usize),
    Instance(InstanceId),
}

/// Affine port reduction: `V_inner = Ap * V_port + V0`.
#[derive(Debug, Clone)]
pub(crate) struct Reduction {
    pub(crate) ap: DMatrix<RationalFunction>,
    pub(crate) v0: DVector<RationalFunction>,
}

/// A template instantiated with concrete parameters and port bindings.
#[derive(Debug)]
pub struct Instance {
    pub(crate) name: String,
    pub(crate) template: String,
    pub(crate) parent: Option<InstanceId>,
    /// Local port net to the parent net it is bound to, in port order.
    pub(crate) ports: IndexMap<String, String>,
    pub(crate) params: ParamMap,
    pub(crate) elements: IndexMap<String, Element>,
    pub(crate) children: IndexMap<String, InstanceId>,
    /// Everything attached to each net, in declaration order.
    pub(crate) incidence: IndexMap<String, Vec<Incident>>,
    /// Unknown nets: inner nets first, then ports.
    pub(crate) nets: Vec<String>,
    pub(crate) inner_count: usize,
    pub(crate) net_index: HashMap<String, usize>,
    pub(crate) reduction: Option<Reduction>,
    /// Voltage sources whose constraint has already been assigned to a net.
    pub(crate) used_sources: HashSet<usize>,
    /// Ports tied to other ports through voltage-source chains.
    pub(crate) chained_ports: IndexMap<String, Vec<String>>,
    pub(crate) voltage_cache: RefCell<HashMap<String, RationalFunction>>,
    pub(crate) current_cache: RefCell<HashMap<String, RationalFunction>>,
}

impl Instance {
    pub(crate) fn new(
        name: String,
        template: String,
        parent: Option<InstanceId>,
        ports: IndexMap<String, String>,
        params: ParamMap,
    ) -> Self {
        // Declared ports are nets even if nothing inside connects to them.
        let incidence = ports.keys().map(|p| (p.clone(), Vec::new())).collect();
        Self {
            name,
            template,
            parent,
            ports,
            params,
            elements: IndexMap::new(),
            children: IndexMap::new(),
            incidence,
            nets: Vec::new(),
            inner_count: 0,
            net_index: HashMap::new(),
            reduction: None,
            used_sources: HashSet::new(),
            chained_ports: IndexMap::new(),
            voltage_cache: RefCell::new(HashMap::new()),
            current_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Instance name; empty for the top level.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the template this instance was built from.
    pub fn template_name(&self) -> &str {
        &self.template
    }

    pub fn parent(&self) -> Option<InstanceId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Evaluated parameters.
    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.get(name)
    }

    /// Child instance by name.
    pub fn child(&self, name: &str) -> Option<InstanceId> {
        self.children.get(name).copied()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, InstanceId)> {
        self.children.iter().map(|(n, id)| (n.as_str(), *id))
    }

    /// Parent net bound to a local port.
    pub fn port_binding(&self, port: &str) -> Option<&str> {
        self.ports.get(port).map(String::as_str)
    }

    /// Nets solved for inside this instance.
    pub fn inner_nets(&self) -> &[String] {
        &self.nets[..self.inner_count]
    }

    /// Port nets in declaration order.
    pub fn port_nets(&self) -> &[String] {
        &self.nets[self.inner_count..]
    }

    /// Column/row index of a net, `None` for the top-level ground.
    pub fn net_index(&self, net: &str) -> Option<usize> {
        self.net_index.get(net).copied()
    }

    /// Whether `net` is connected to anything in this instance.
    pub fn has_net(&self, net: &str) -> bool {
        self.incidence.contains_key(net)
    }

    /// `Ap`: inner net voltages per unit port voltage (inner x port).
    pub fn ap(&self) -> Option<&DMatrix<RationalFunction>> {
        self.reduction.as_ref().map(|r| &r.ap)
    }

    /// `V0`: inner net voltages with all ports grounded.
    pub fn v0(&self) -> Option<&DVector<RationalFunction>> {
        self.reduction.as_ref().map(|r| &r.v0)
    }

    pub fn is_solved(&self) -> bool {
        self.reduction.is_some()
    }

    /// Other ports this port is tied to by voltage sources.
    pub fn chained_ports(&self, port: &str) -> &[String] {
        self.chained_ports
            .get(port)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn is_port(&self, net: &str) -> bool {
        self.ports.contains_key(net)
    }

    pub(crate) fn attach(&mut self, net: &str, incident: Incident) {
        let list = self.incidence.entry(net.to_string()).or_default();
        if !list.contains(&incident) {
            list.push(incident);
        }
    }

    /// Partition nets into inner nets (first-seen order) followed by ports.
    /// The top-level ground is not an unknown.
    pub(crate) fn classify_nets(&mut self) {
        let is_root = self.is_root();
        let mut nets: Vec<String> = self
            .incidence
            .keys()
            .filter(|n| !self.ports.contains_key(*n) && !(is_root && n.as_str() == GROUND))
            .cloned()
            .collect();
        self.inner_count = nets.len();
        nets.extend(self.ports.keys().cloned());
        self.net_index = nets
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        self.nets = nets;
    }

    pub(crate) fn reset(&mut self) {
        self.used_sources.clear();
        self.reduction = None;
        self.voltage_cache.borrow_mut().clear();
        self.current_cache.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_classify_root() {
        let mut inst = Instance::new(String::new(), "top".into(), None, IndexMap::new(), ParamMap::new());
        inst.attach("in", Incident::Element(0));
        inst.attach("0", Incident::Element(0));
        inst.attach("out", Incident::Element(1));
        inst.classify_nets();
        assert_eq!(inst.inner_nets(), ["in", "out"]);
        assert!(inst.port_nets().is_empty());
        assert_eq!(inst.net_index("0"), None);
    }

    #[test]
    fn test_classify_nested_ground_is_inner() {
        let mut inst = Instance::new(
            "x1".into(),
            "div".into(),
            Some(InstanceId::ROOT),
            ports(&[("a", "n1"), ("b", "n2")]),
            ParamMap::new(),
        );
        inst.attach("mid", Incident::Element(0));
        inst.attach("a", Incident::Element(0));
        inst.attach("0", Incident::Element(1));
        inst.classify_nets();
        assert_eq!(inst.inner_nets(), ["mid", "0"]);
        assert_eq!(inst.port_nets(), ["a", "b"]);
        assert_eq!(inst.net_index("b"), Some(3));
    }

    #[test]
    fn test_attach_deduplicates() {
        let mut inst = Instance::new(String::new(), "top".into(), None, IndexMap::new(), ParamMap::new());
        inst.attach("a", Incident::Element(0));
        inst.attach("a", Incident::Element(0));
        assert_eq!(inst.incidence["a"].len(), 1);
    }
}
