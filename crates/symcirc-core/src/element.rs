//! Instantiated circuit elements.

use symcirc_algebra::{FREQUENCY, RationalFunction};

use crate::error::ElementError;
use crate::expression::Lookup;
use crate::params::evaluate;
use crate::template::ElementTemplate;

/// Element kind, selected by the first letter of the element name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// `R p m value`
    Resistor,
    /// `C p m value`
    Capacitor,
    /// `L p m value`
    Inductor,
    /// `V p m value`
    VoltageSource,
    /// `I p m value`, driving current from `m` through the source into `p`.
    CurrentSource,
    /// `E p m cp cm gain`
    Vcvs,
    /// `G p m cp cm gm`, driving `gm * (V(cp) - V(cm))` into `p`.
    Vccs,
    /// `F p m ref gain`
    Cccs,
    /// `H p m ref r`
    Ccvs,
}

impl ElementKind {
    /// Kind for an element name, `None` for unknown letters and for
    /// subcircuit references.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.chars().next()?.to_ascii_lowercase() {
            'r' => Self::Resistor,
            'c' => Self::Capacitor,
            'l' => Self::Inductor,
            'v' => Self::VoltageSource,
            'i' => Self::CurrentSource,
            'e' => Self::Vcvs,
            'g' => Self::Vccs,
            'f' => Self::Cccs,
            'h' => Self::Ccvs,
            _ => return None,
        };
        Some(kind)
    }

    /// Number of nets the element connects.
    pub fn net_count(self) -> usize {
        match self {
            Self::Vcvs | Self::Vccs => 4,
            _ => 2,
        }
    }

    /// Elements that fix the voltage across their outputs.
    pub fn is_voltage_type(self) -> bool {
        matches!(self, Self::VoltageSource | Self::Vcvs | Self::Ccvs)
    }

    /// Elements that force a current regardless of their terminal voltages.
    pub fn is_current_source(self) -> bool {
        matches!(self, Self::CurrentSource | Self::Vccs | Self::Cccs)
    }

    fn is_passive(self) -> bool {
        matches!(self, Self::Resistor | Self::Capacitor | Self::Inductor)
    }

    fn value_keys(self) -> &'static [&'static str] {
        match self {
            Self::Resistor => &["r", "R"],
            Self::Capacitor => &["c", "C"],
            Self::Inductor => &["l", "L"],
            Self::VoltageSource | Self::CurrentSource => &["dc", "DC"],
            _ => &[],
        }
    }
}

/// A concrete element of an instance.
#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    kind: ElementKind,
    nets: Vec<String>,
    /// Controlling element of a current-controlled source.
    control: Option<String>,
    value: RationalFunction,
    /// Branch admittance of R, C and L.
    admittance: Option<RationalFunction>,
}

impl Element {
    /// Build an element from its template, evaluating the value in `scope`.
    pub(crate) fn from_template<L: Lookup + ?Sized>(
        name: &str,
        kind: ElementKind,
        template: &ElementTemplate,
        scope: &mut L,
    ) -> Result<Self, ElementError> {
        let mut args: Vec<&str> = template.args.iter().map(String::as_str).collect();

        let control = match kind {
            ElementKind::Cccs | ElementKind::Ccvs => {
                if args.len() != 4 {
                    return Err(ElementError::Arity {
                        element: name.to_string(),
                        expected: 2,
                        actual: args.len().saturating_sub(2),
                    });
                }
                Some(args.remove(2).to_string())
            }
            _ => None,
        };

        let expr = match template.named_value(kind.value_keys()) {
            Some(expr) => expr,
            None => {
                if args.len() == kind.net_count() {
                    return Err(ElementError::MissingValue(name.to_string()));
                }
                args.pop().ok_or_else(|| ElementError::Arity {
                    element: name.to_string(),
                    expected: kind.net_count(),
                    actual: 0,
                })?
            }
        };

        if args.len() != kind.net_count() {
            return Err(ElementError::Arity {
                element: name.to_string(),
                expected: kind.net_count(),
                actual: args.len(),
            });
        }

        let value = evaluate(expr, scope).map_err(|source| ElementError::Parameter {
            element: name.to_string(),
            source,
        })?;

        let admittance = if kind.is_passive() {
            Some(passive_admittance(name, kind, &value)?)
        } else {
            None
        };

        Ok(Self {
            name: name.to_string(),
            kind,
            nets: args.into_iter().map(str::to_string).collect(),
            control,
            value,
            admittance,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Connected nets: outputs first, then control nets for E and G.
    pub fn nets(&self) -> &[String] {
        &self.nets
    }

    /// The two output nets.
    pub fn outputs(&self) -> (&str, &str) {
        (&self.nets[0], &self.nets[1])
    }

    /// Control nets of a voltage-controlled source.
    pub fn control_nets(&self) -> Option<(&str, &str)> {
        match self.kind {
            ElementKind::Vcvs | ElementKind::Vccs => Some((&self.nets[2], &self.nets[3])),
            _ => None,
        }
    }

    /// Name of the controlling element of F and H.
    pub fn control(&self) -> Option<&str> {
        self.control.as_deref()
    }

    /// The evaluated value (resistance, capacitance, source value or gain).
    pub fn value(&self) -> &RationalFunction {
        &self.value
    }

    /// Admittance of a passive element.
    pub fn admittance(&self) -> Option<&RationalFunction> {
        self.admittance.as_ref()
    }

    pub fn is_voltage_type(&self) -> bool {
        self.kind.is_voltage_type()
    }

    pub fn is_current_source(&self) -> bool {
        self.kind.is_current_source()
    }

    /// `+1` at the first output, `-1` at the second. `None` if `net` is not
    /// an output or both outputs are the same net.
    pub fn output_sign(&self, net: &str) -> Option<i64> {
        let (p, m) = self.outputs();
        if p == m {
            None
        } else if net == p {
            Some(1)
        } else if net == m {
            Some(-1)
        } else {
            None
        }
    }

    /// The output opposite `net`.
    pub fn other_output(&self, net: &str) -> Option<&str> {
        let (p, m) = self.outputs();
        if net == p {
            Some(m)
        } else if net == m {
            Some(p)
        } else {
            None
        }
    }
}

fn passive_admittance(
    name: &str,
    kind: ElementKind,
    value: &RationalFunction,
) -> Result<RationalFunction, ElementError> {
    let s = RationalFunction::symbol(FREQUENCY);
    let zero = || ElementError::ZeroValue(name.to_string());
    match kind {
        ElementKind::Resistor => value.inv().map_err(|_| zero()),
        ElementKind::Capacitor => Ok(&s * value),
        _ => (&s * value).inv().map_err(|_| zero()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamChain, ParamMap};

    fn build(name: &str, spec: &str) -> Result<Element, ElementError> {
        let params = ParamMap::from([("R1".to_string(), RationalFunction::symbol("R1"))]);
        let kind = ElementKind::from_name(name).unwrap();
        Element::from_template(
            name,
            kind,
            &ElementTemplate::parse(spec),
            &mut ParamChain::new(vec![&params]),
        )
    }

    #[test]
    fn test_kind_from_first_letter() {
        assert_eq!(ElementKind::from_name("r1"), Some(ElementKind::Resistor));
        assert_eq!(ElementKind::from_name("Vin"), Some(ElementKind::VoltageSource));
        assert_eq!(ElementKind::from_name("H2"), Some(ElementKind::Ccvs));
        assert_eq!(ElementKind::from_name("x1"), None);
        assert_eq!(ElementKind::from_name("Q1"), None);
        assert_eq!(ElementKind::from_name(""), None);
    }

    #[test]
    fn test_resistor_admittance() {
        let r = build("R1", "a b R1").unwrap();
        assert_eq!(r.nets(), ["a", "b"]);
        assert_eq!(r.admittance().unwrap(), &RationalFunction::symbol("R1").inv().unwrap());
    }

    #[test]
    fn test_named_value() {
        let r = build("R2", "a b r=2k").unwrap();
        assert_eq!(r.value(), &RationalFunction::from_integer(2000));
        let v = build("V1", "in 0 dc=5").unwrap();
        assert_eq!(v.value(), &RationalFunction::from_integer(5));
    }

    #[test]
    fn test_capacitor_and_inductor() {
        let s = RationalFunction::symbol("s");
        let c = build("C1", "a 0 1u").unwrap();
        let cval = &RationalFunction::from_integer(1) / &RationalFunction::from_integer(1_000_000);
        assert_eq!(c.admittance().unwrap(), &(&s * &cval));
        let l = build("L1", "a 0 R1").unwrap();
        assert_eq!(
            l.admittance().unwrap(),
            &(&s * &RationalFunction::symbol("R1")).inv().unwrap()
        );
    }

    #[test]
    fn test_controlled_sources() {
        let e = build("E1", "o 0 p m 10").unwrap();
        assert_eq!(e.control_nets(), Some(("p", "m")));
        assert!(e.is_voltage_type());
        let f = build("F1", "o 0 Vs 2").unwrap();
        assert_eq!(f.nets(), ["o", "0"]);
        assert_eq!(f.control(), Some("Vs"));
        assert!(f.is_current_source());
    }

    #[test]
    fn test_arity_errors() {
        assert!(matches!(
            build("R1", "a b c 1k"),
            Err(ElementError::Arity { expected: 2, actual: 3, .. })
        ));
        assert!(matches!(
            build("G1", "a b 1"),
            Err(ElementError::Arity { expected: 4, actual: 2, .. })
        ));
        assert!(matches!(build("H1", "a b 1"), Err(ElementError::Arity { .. })));
    }

    #[test]
    fn test_missing_value() {
        assert!(matches!(build("R1", "a b"), Err(ElementError::MissingValue(_))));
        assert!(matches!(build("G1", "a b c d"), Err(ElementError::MissingValue(_))));
    }

    #[test]
    fn test_zero_resistance_rejected() {
        assert!(matches!(build("R1", "a b 0"), Err(ElementError::ZeroValue(_))));
        assert!(build("C1", "a b 0").is_ok());
    }

    #[test]
    fn test_bad_value_expression() {
        assert!(matches!(
            build("R1", "a b Rmissing"),
            Err(ElementError::Parameter { .. })
        ));
    }

    #[test]
    fn test_output_sign() {
        let r = build("R1", "a b 1").unwrap();
        assert_eq!(r.output_sign("a"), Some(1));
        assert_eq!(r.output_sign("b"), Some(-1));
        assert_eq!(r.output_sign("c"), None);
        assert_eq!(r.other_output("a"), Some("b"));
        let shorted = build("R2", "a a 1").unwrap();
        assert_eq!(shorted.output_sign("a"), None);
    }
}
