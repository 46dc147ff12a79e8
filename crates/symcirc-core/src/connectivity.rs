//! Connectivity checks run before solving.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;

use crate::GROUND;
use crate::circuit::Circuit;
use crate::instance::{Incident, InstanceId};

impl Circuit {
    /// Whether every net has a path to ground through elements other than
    /// current sources.
    pub fn check_ground_path(&self) -> bool {
        self.nets_without_ground_path().is_empty()
    }

    /// Dotted names of nets with no path to ground. Each is logged at error
    /// level.
    pub fn nets_without_ground_path(&self) -> Vec<String> {
        let mut reached: HashSet<(InstanceId, String)> = HashSet::new();
        let mut queue = VecDeque::new();
        let start = (InstanceId::ROOT, GROUND.to_string());
        reached.insert(start.clone());
        queue.push_back(start);

        while let Some((x, net)) = queue.pop_front() {
            for next in self.ground_neighbours(x, &net) {
                if reached.insert(next.clone()) {
                    queue.push_back(next);
                }
            }
        }

        let mut missing = Vec::new();
        for (id, inst) in self.instances() {
            for net in inst.incidence.keys() {
                // Port nets are reported by the instance that owns the net.
                if inst.is_port(net) {
                    continue;
                }
                if !reached.contains(&(id, net.clone())) {
                    let name = self.qualified(id, net);
                    log::error!("net {} has no connection to gnd", name);
                    missing.push(name);
                }
            }
        }
        missing
    }

    fn ground_neighbours(&self, x: InstanceId, net: &str) -> Vec<(InstanceId, String)> {
        let inst = self.instance(x);
        let mut out = Vec::new();
        if let Some(incidents) = inst.incidence.get(net) {
            for incident in incidents {
                match *incident {
                    Incident::Element(ei) => {
                        let element = &inst.elements[ei];
                        if element.is_current_source() {
                            continue;
                        }
                        if let Some(other) = element.other_output(net) {
                            out.push((x, other.to_string()));
                        }
                    }
                    Incident::Instance(c) => {
                        for (port, bound) in &self.instance(c).ports {
                            if bound == net {
                                out.push((c, port.clone()));
                            }
                        }
                    }
                }
            }
        }
        if let (Some(parent), Some(bound)) = (inst.parent, inst.ports.get(net)) {
            out.push((parent, bound.clone()));
        }
        out
    }

    /// Whether the circuit is free of voltage-source loops. Also records,
    /// for every port, the other ports it is chained to.
    pub fn check_voltage_loops(&mut self) -> bool {
        self.voltage_loops().is_empty()
    }

    /// Nets of every loop formed by voltage-type elements, with dotted names.
    /// Each loop is logged at error level.
    pub fn voltage_loops(&mut self) -> Vec<Vec<String>> {
        let loops = self.instance_loops(InstanceId::ROOT);
        for chain in &loops {
            log::error!("voltage loop on nets {}", chain.join(", "));
        }
        loops
    }

    fn instance_loops(&mut self, x: InstanceId) -> Vec<Vec<String>> {
        let children: Vec<InstanceId> = self.instance(x).children.values().copied().collect();
        let mut loops = Vec::new();
        for child in children {
            loops.extend(self.instance_loops(child));
        }

        let inst = self.instance(x);
        let mut chains = UnionFind::new(inst.incidence.len());
        let index = |net: &str| inst.incidence.get_index_of(net);

        for element in inst.elements.values() {
            if !element.is_voltage_type() {
                continue;
            }
            let (p, m) = element.outputs();
            if let (Some(a), Some(b)) = (index(p), index(m)) {
                chains.union(a, b);
            }
        }
        for &child in inst.children.values() {
            let child_inst = self.instance(child);
            for group in port_groups(&child_inst.chained_ports) {
                let nets: Vec<usize> = group
                    .iter()
                    .filter_map(|port| child_inst.ports.get(port.as_str()))
                    .filter_map(|bound| index(bound.as_str()))
                    .collect();
                for pair in nets.windows(2) {
                    chains.union(pair[0], pair[1]);
                }
            }
        }

        let nets: Vec<&String> = inst.incidence.keys().collect();
        let mut seen = HashSet::new();
        for i in 0..nets.len() {
            let root = chains.find(i);
            if chains.has_loop(root) && seen.insert(root) {
                loops.push(
                    (0..nets.len())
                        .filter(|&j| chains.find(j) == root)
                        .map(|j| self.qualified(x, nets[j]))
                        .collect(),
                );
            }
        }

        let ports: Vec<String> = inst.ports.keys().cloned().collect();
        let mut chained = IndexMap::new();
        for port in &ports {
            let Some(i) = index(port.as_str()) else { continue };
            let root = chains.find(i);
            let others: Vec<String> = ports
                .iter()
                .filter(|q| *q != port)
                .filter(|q| index(q.as_str()).is_some_and(|j| chains.find(j) == root))
                .cloned()
                .collect();
            chained.insert(port.clone(), others);
        }
        self.instance_mut(x).chained_ports = chained;
        loops
    }
}

/// Groups of mutually chained ports, each listed once.
fn port_groups(chained: &IndexMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let mut assigned: HashSet<&str> = HashSet::new();
    let mut groups = Vec::new();
    for (port, others) in chained {
        if others.is_empty() || assigned.contains(port.as_str()) {
            continue;
        }
        assigned.insert(port.as_str());
        assigned.extend(others.iter().map(String::as_str));
        let mut group = vec![port.clone()];
        group.extend(others.iter().cloned());
        groups.push(group);
    }
    groups
}

/// Disjoint sets that remember whether a union ever closed a cycle.
struct UnionFind {
    parent: Vec<usize>,
    looped: Vec<bool>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            looped: vec![false; n],
        }
    }

    fn find(&self, mut i: usize) -> usize {
        while self.parent[i] != i {
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            self.looped[ra] = true;
        } else {
            self.parent[rb] = ra;
            self.looped[ra] |= self.looped[rb];
        }
    }

    fn has_loop(&self, root: usize) -> bool {
        self.looped[root]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;

    #[test]
    fn test_ground_path_ok() {
        let mut top = Template::new("top");
        top.element("V1", "a 0 1").unwrap();
        top.element("R1", "a b 1").unwrap();
        top.element("C1", "b 0 1").unwrap();
        let circuit = Circuit::new(&top).unwrap();
        assert!(circuit.check_ground_path());
    }

    #[test]
    fn test_current_source_only_net() {
        let mut top = Template::new("top");
        top.element("I1", "0 n 1").unwrap();
        top.element("R1", "a 0 1").unwrap();
        top.element("G1", "n 0 a 0 2").unwrap();
        let circuit = Circuit::new(&top).unwrap();
        assert!(!circuit.check_ground_path());
        assert_eq!(circuit.nets_without_ground_path(), vec!["n"]);
    }

    #[test]
    fn test_floating_net_in_subcircuit() {
        let mut sub = Template::subcircuit("s", &["p"]);
        sub.element("R1", "p q 1").unwrap();
        sub.element("I1", "r q 1").unwrap();
        let mut top = Template::new("top");
        top.add_subcircuit(sub).unwrap();
        top.element("R1", "n 0 1").unwrap();
        top.element("x1", "n s").unwrap();
        let circuit = Circuit::new(&top).unwrap();
        assert_eq!(circuit.nets_without_ground_path(), vec!["x1.r"]);
    }

    #[test]
    fn test_unreached_local_ground_reported() {
        let mut sub = Template::subcircuit("src", &["p"]);
        sub.element("R1", "p 0 1").unwrap();
        sub.element("I1", "q 0 1").unwrap();
        sub.element("I2", "q p 1").unwrap();
        let mut bias = Template::subcircuit("bias", &["p"]);
        bias.element("I1", "p 0 1").unwrap();
        let mut top = Template::new("top");
        top.add_subcircuit(sub).unwrap();
        top.add_subcircuit(bias).unwrap();
        top.element("R1", "n 0 1").unwrap();
        top.element("x1", "n src").unwrap();
        top.element("x2", "n bias").unwrap();
        let circuit = Circuit::new(&top).unwrap();
        // x1's local 0 is reached through R1; x2's only through a source.
        assert_eq!(circuit.nets_without_ground_path(), vec!["x1.q", "x2.0"]);
    }

    #[test]
    fn test_port_groups_listed_once() {
        let mut chained = IndexMap::new();
        chained.insert("a".to_string(), vec!["b".to_string(), "c".to_string()]);
        chained.insert("b".to_string(), vec!["a".to_string(), "c".to_string()]);
        chained.insert("c".to_string(), vec!["a".to_string(), "b".to_string()]);
        chained.insert("d".to_string(), Vec::new());
        chained.insert("e".to_string(), vec!["f".to_string()]);
        chained.insert("f".to_string(), vec!["e".to_string()]);
        assert_eq!(
            port_groups(&chained),
            vec![vec!["a", "b", "c"], vec!["e", "f"]]
        );
    }

    #[test]
    fn test_voltage_loop_detected() {
        let mut top = Template::new("top");
        top.element("V1", "A B 1").unwrap();
        top.element("V2", "B A 2").unwrap();
        top.element("R1", "A 0 1").unwrap();
        let mut circuit = Circuit::new(&top).unwrap();
        assert!(!circuit.check_voltage_loops());
        let loops = circuit.voltage_loops();
        assert_eq!(loops.len(), 1);
        assert!(loops[0].contains(&"A".to_string()));
        assert!(loops[0].contains(&"B".to_string()));
    }

    #[test]
    fn test_loop_through_subcircuit_chain() {
        let mut sub = Template::subcircuit("wire", &["a", "b"]);
        sub.element("V1", "a m 1").unwrap();
        sub.element("V2", "m b 1").unwrap();
        let mut top = Template::new("top");
        top.add_subcircuit(sub).unwrap();
        top.element("x1", "p q wire").unwrap();
        top.element("V3", "p q 1").unwrap();
        top.element("R1", "p 0 1").unwrap();
        let mut circuit = Circuit::new(&top).unwrap();
        let loops = circuit.voltage_loops();
        assert_eq!(loops, vec![vec!["p".to_string(), "q".to_string()]]);

        let x1 = circuit.instance(circuit.find_instance("x1").unwrap());
        assert_eq!(x1.chained_ports("a"), ["b"]);
    }

    #[test]
    fn test_tree_of_sources_is_not_a_loop() {
        let mut top = Template::new("top");
        top.element("V1", "a 0 1").unwrap();
        top.element("V2", "b a 1").unwrap();
        top.element("V3", "c a 1").unwrap();
        let mut circuit = Circuit::new(&top).unwrap();
        assert!(circuit.check_voltage_loops());
    }
}
