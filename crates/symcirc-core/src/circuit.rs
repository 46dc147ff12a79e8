//! The instance tree and the builder that populates it from templates.

use indexmap::IndexMap;

use crate::GROUND;
use crate::element::{Element, ElementKind};
use crate::error::{ElementError, InstanceError, Result};
use crate::instance::{Incident, Instance, InstanceId};
use crate::params::{ParamChain, ParamMap, evaluate, evaluate_params};
use crate::template::{ElementTemplate, Template};

/// Separator of hierarchical names (`x1.x2.out`).
pub const SEPARATOR: char = '.';

/// Display name of the top-level instance in messages.
pub(crate) const TOP_INSTANCE: &str = "TOP INSTANCE";

/// A fully instantiated circuit hierarchy.
///
/// Instances live in an arena indexed by [`InstanceId`]; the top level is
/// [`InstanceId::ROOT`]. Children are built before their parent is complete,
/// so every id is valid for the lifetime of the circuit.
#[derive(Debug)]
pub struct Circuit {
    pub(crate) instances: Vec<Instance>,
}

impl Circuit {
    /// Instantiate `template` as the top-level circuit.
    pub fn new(template: &Template) -> Result<Self> {
        let mut circuit = Self {
            instances: Vec::new(),
        };
        circuit.build(
            template,
            &[template],
            String::new(),
            None,
            IndexMap::new(),
            ParamMap::new(),
        )?;
        log::debug!(
            "built circuit '{}' with {} instances",
            template.name,
            circuit.instances.len()
        );
        Ok(circuit)
    }

    pub fn root(&self) -> &Instance {
        &self.instances[InstanceId::ROOT.0]
    }

    pub fn instance(&self, id: InstanceId) -> &Instance {
        &self.instances[id.0]
    }

    pub(crate) fn instance_mut(&mut self, id: InstanceId) -> &mut Instance {
        &mut self.instances[id.0]
    }

    /// All instances, parents before children.
    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &Instance)> {
        self.instances
            .iter()
            .enumerate()
            .map(|(i, inst)| (InstanceId(i), inst))
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Find an instance by dotted path; the empty path is the top level.
    pub fn find_instance(&self, path: &str) -> Result<InstanceId> {
        let mut id = InstanceId::ROOT;
        if path.is_empty() {
            return Ok(id);
        }
        for name in path.split(SEPARATOR) {
            id = self.child_of(id, name)?;
        }
        Ok(id)
    }

    pub(crate) fn child_of(&self, id: InstanceId, name: &str) -> Result<InstanceId> {
        self.instance(id)
            .child(name)
            .ok_or_else(|| InstanceError::NoSuchInstance {
                circuit: self.label(id),
                name: name.to_string(),
            })
    }

    /// Split a dotted name into its instance and the last component.
    pub(crate) fn resolve(&self, dotted: &str) -> Result<(InstanceId, String)> {
        match dotted.rsplit_once(SEPARATOR) {
            Some((path, last)) => Ok((self.find_instance(path)?, last.to_string())),
            None => Ok((InstanceId::ROOT, dotted.to_string())),
        }
    }

    /// Dotted path of an instance; empty for the top level.
    pub fn path(&self, id: InstanceId) -> String {
        let mut names = Vec::new();
        let mut cur = id;
        while let Some(parent) = self.instance(cur).parent {
            names.push(self.instance(cur).name.as_str());
            cur = parent;
        }
        names.reverse();
        names.join(SEPARATOR.encode_utf8(&mut [0; 4]))
    }

    /// Dotted name of a net or element inside an instance.
    pub fn qualified(&self, id: InstanceId, name: &str) -> String {
        if id.is_root() {
            name.to_string()
        } else {
            format!("{}{}{}", self.path(id), SEPARATOR, name)
        }
    }

    /// Instance name used in messages.
    pub(crate) fn label(&self, id: InstanceId) -> String {
        if id.is_root() {
            TOP_INSTANCE.to_string()
        } else {
            self.path(id)
        }
    }

    /// Evaluated parameters of `id` followed by each ancestor's.
    fn param_chain(&self, id: Option<InstanceId>) -> ParamChain<'_> {
        let mut maps = Vec::new();
        let mut cur = id;
        while let Some(i) = cur {
            let inst = self.instance(i);
            maps.push(&inst.params);
            cur = inst.parent;
        }
        ParamChain::new(maps)
    }

    /// Recursively instantiate `template`.
    ///
    /// `scopes` is the chain of templates lexically enclosing `template`,
    /// outermost first and `template` itself last; subcircuit references are
    /// looked up innermost first.
    fn build(
        &mut self,
        template: &Template,
        scopes: &[&Template],
        name: String,
        parent: Option<InstanceId>,
        ports: IndexMap<String, String>,
        passed: ParamMap,
    ) -> Result<InstanceId> {
        let params = evaluate_params(&template.params, passed, self.param_chain(parent))
            .map_err(|source| InstanceError::Parameter {
                circuit: template.name.clone(),
                source,
            })?;

        let id = InstanceId(self.instances.len());
        self.instances.push(Instance::new(
            name,
            template.name.clone(),
            parent,
            ports,
            params,
        ));

        for (element_name, element) in &template.elements {
            let is_subcircuit = element_name
                .chars()
                .next()
                .is_some_and(|c| c.eq_ignore_ascii_case(&'x'));
            if is_subcircuit {
                self.build_child(id, template, scopes, element_name, element)?;
                continue;
            }

            let kind = ElementKind::from_name(element_name)
                .ok_or_else(|| InstanceError::UnknownElementKind(element_name.clone()))?;
            let built = Element::from_template(
                element_name,
                kind,
                element,
                &mut self.param_chain(Some(id)),
            )
            .map_err(|source| InstanceError::Element {
                circuit: template.name.clone(),
                element: element_name.clone(),
                source,
            })?;
            self.add_element(id, template, built)?;
        }

        self.check_references(id, template)?;
        self.instance_mut(id).classify_nets();
        let inst = self.instance(id);
        if parent.is_some() && inst.incidence.contains_key(GROUND) && !inst.is_port(GROUND) {
            log::warn!(
                "{}: local net {} is not the top-level reference; pass it in as a port",
                self.label(id),
                GROUND
            );
        }
        Ok(id)
    }

    fn build_child(
        &mut self,
        id: InstanceId,
        template: &Template,
        scopes: &[&Template],
        name: &str,
        element: &ElementTemplate,
    ) -> Result<()> {
        let Some((subcircuit_name, bound)) = element.args.split_last() else {
            return Err(InstanceError::UnknownSubcircuit {
                circuit: template.name.clone(),
                instance: name.to_string(),
                subcircuit: String::new(),
            });
        };

        let depth = scopes
            .iter()
            .rposition(|t| t.subcircuits.contains_key(subcircuit_name))
            .ok_or_else(|| InstanceError::UnknownSubcircuit {
                circuit: template.name.clone(),
                instance: name.to_string(),
                subcircuit: subcircuit_name.clone(),
            })?;
        let scope = scopes[depth];
        let subcircuit = &scope.subcircuits[subcircuit_name];

        if subcircuit.ports.len() != bound.len() {
            return Err(InstanceError::PortCount {
                instance: name.to_string(),
                subcircuit: subcircuit_name.clone(),
                expected: subcircuit.ports.len(),
                actual: bound.len(),
            });
        }
        if self.instance(id).children.contains_key(name) {
            return Err(InstanceError::DuplicateName {
                circuit: template.name.clone(),
                name: name.to_string(),
            });
        }

        let mut passed = ParamMap::new();
        {
            let mut chain = self.param_chain(Some(id));
            for (key, expr) in &element.named {
                let value = evaluate(expr, &mut chain).map_err(|source| InstanceError::Element {
                    circuit: template.name.clone(),
                    element: name.to_string(),
                    source: ElementError::Parameter {
                        element: name.to_string(),
                        source,
                    },
                })?;
                passed.insert(key.clone(), value);
            }
        }

        let ports: IndexMap<String, String> = subcircuit
            .ports
            .iter()
            .cloned()
            .zip(bound.iter().cloned())
            .collect();

        // The definition's lexical scope is the template that owns it.
        let mut child_scopes: Vec<&Template> = scopes[..=depth].to_vec();
        child_scopes.push(subcircuit);

        let child = self
            .build(
                subcircuit,
                &child_scopes,
                name.to_string(),
                Some(id),
                ports,
                passed,
            )
            .map_err(|source| InstanceError::Nested {
                instance: name.to_string(),
                source: Box::new(source),
            })?;

        let inst = self.instance_mut(id);
        inst.children.insert(name.to_string(), child);
        for net in bound {
            inst.attach(net, Incident::Instance(child));
        }
        Ok(())
    }

    fn add_element(&mut self, id: InstanceId, template: &Template, element: Element) -> Result<()> {
        let inst = self.instance_mut(id);
        if inst.elements.contains_key(element.name()) {
            return Err(InstanceError::DuplicateName {
                circuit: template.name.clone(),
                name: element.name().to_string(),
            });
        }
        let nets = element.nets().to_vec();
        let (index, _) = inst
            .elements
            .insert_full(element.name().to_string(), element);
        for net in &nets {
            inst.attach(net, Incident::Element(index));
        }
        Ok(())
    }

    /// Current-controlled sources must name an element of the same instance.
    fn check_references(&self, id: InstanceId, template: &Template) -> Result<()> {
        let inst = self.instance(id);
        for element in inst.elements.values() {
            if let Some(control) = element.control() {
                if !inst.elements.contains_key(control) {
                    return Err(InstanceError::Element {
                        circuit: template.name.clone(),
                        element: element.name().to_string(),
                        source: ElementError::UnknownReference {
                            element: element.name().to_string(),
                            reference: control.to_string(),
                        },
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symcirc_algebra::RationalFunction;

    fn divider() -> Template {
        let mut div = Template::subcircuit("div", &["in", "out"]);
        div.symbols(&["R1", "R2"]);
        div.element("R1", "in out R1").unwrap();
        div.element("R2", "out 0 R2").unwrap();
        div
    }

    #[test]
    fn test_build_flat() {
        let mut top = Template::new("top");
        top.element("V1", "in 0 5").unwrap();
        top.element("R1", "in out 1k").unwrap();
        top.element("R2", "out 0 1k").unwrap();
        let circuit = Circuit::new(&top).unwrap();
        assert_eq!(circuit.len(), 1);
        assert_eq!(circuit.root().inner_nets(), ["in", "out"]);
        assert_eq!(circuit.root().elements().count(), 3);
    }

    #[test]
    fn test_build_hierarchy() {
        let mut top = Template::new("top");
        top.add_subcircuit(divider()).unwrap();
        top.element("V1", "a 0 1").unwrap();
        top.element("x1", "a b div").unwrap();
        let circuit = Circuit::new(&top).unwrap();

        let x1 = circuit.find_instance("x1").unwrap();
        let inst = circuit.instance(x1);
        assert_eq!(inst.port_binding("in"), Some("a"));
        assert_eq!(inst.port_nets(), ["in", "out"]);
        // The divider's local ground is an ordinary inner net.
        assert_eq!(inst.inner_nets(), ["0"]);
        assert_eq!(circuit.path(x1), "x1");
        assert_eq!(circuit.qualified(x1, "out"), "x1.out");
    }

    #[test]
    fn test_passed_params_override_defaults() {
        let mut sub = Template::subcircuit("load", &["a"]);
        sub.param("R", "1k");
        sub.element("R1", "a 0 R").unwrap();

        let mut top = Template::new("top");
        top.add_subcircuit(sub).unwrap();
        top.param("Rload", "Rload");
        top.element("x1", "n load R=2*Rload").unwrap();
        top.element("x2", "n load").unwrap();
        top.element("V1", "n 0 1").unwrap();
        let circuit = Circuit::new(&top).unwrap();

        let x1 = circuit.instance(circuit.find_instance("x1").unwrap());
        let x2 = circuit.instance(circuit.find_instance("x2").unwrap());
        assert_eq!(
            x1.params()["R"],
            &RationalFunction::from_integer(2) * &RationalFunction::symbol("Rload")
        );
        assert_eq!(x2.params()["R"], RationalFunction::from_integer(1000));
    }

    #[test]
    fn test_subcircuit_resolved_in_enclosing_scope() {
        let mut inner = Template::subcircuit("inner", &["p"]);
        inner.element("x1", "p div_gnd").unwrap();
        let mut gnd = Template::subcircuit("div_gnd", &["p"]);
        gnd.element("R1", "p 0 1").unwrap();

        let mut top = Template::new("top");
        top.add_subcircuit(inner).unwrap();
        top.add_subcircuit(gnd).unwrap();
        top.element("x1", "n inner").unwrap();
        let circuit = Circuit::new(&top).unwrap();
        assert!(circuit.find_instance("x1.x1").is_ok());
    }

    #[test]
    fn test_unknown_subcircuit() {
        let mut top = Template::new("top");
        top.element("x1", "a b nothere").unwrap();
        let err = Circuit::new(&top).unwrap_err();
        assert!(matches!(err, InstanceError::UnknownSubcircuit { subcircuit, .. } if subcircuit == "nothere"));
    }

    #[test]
    fn test_port_count_mismatch() {
        let mut top = Template::new("top");
        top.add_subcircuit(divider()).unwrap();
        top.element("x1", "a div").unwrap();
        let err = Circuit::new(&top).unwrap_err();
        assert!(matches!(err, InstanceError::PortCount { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_nested_error_names_instance() {
        let mut bad = Template::subcircuit("bad", &["a"]);
        bad.element("R1", "a 0 Rundefined").unwrap();
        let mut top = Template::new("top");
        top.add_subcircuit(bad).unwrap();
        top.element("x7", "n bad").unwrap();
        let err = Circuit::new(&top).unwrap_err();
        match err {
            InstanceError::Nested { instance, source } => {
                assert_eq!(instance, "x7");
                assert!(matches!(*source, InstanceError::Element { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_element_kind() {
        let mut top = Template::new("top");
        top.element("Q1", "c b e model").unwrap();
        assert!(matches!(
            Circuit::new(&top),
            Err(InstanceError::UnknownElementKind(name)) if name == "Q1"
        ));
    }

    #[test]
    fn test_unknown_control_reference() {
        let mut top = Template::new("top");
        top.element("F1", "a 0 Vmissing 2").unwrap();
        top.element("R1", "a 0 1").unwrap();
        let err = Circuit::new(&top).unwrap_err();
        assert!(matches!(
            err,
            InstanceError::Element {
                source: ElementError::UnknownReference { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_find_instance_errors() {
        let top = Template::new("top");
        let circuit = Circuit::new(&top).unwrap();
        assert_eq!(circuit.find_instance("").unwrap(), InstanceId::ROOT);
        assert!(matches!(
            circuit.find_instance("x9"),
            Err(InstanceError::NoSuchInstance { .. })
        ));
    }
}
