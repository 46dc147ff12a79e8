//! Parameter scopes.
//!
//! An instance evaluates its parameters in three layers: values passed by the
//! instantiating element, its own default definitions (which may reference
//! each other), and the evaluated parameters of its ancestors, nearest first.

use indexmap::IndexMap;
use symcirc_algebra::RationalFunction;

use crate::error::ParameterError;
use crate::expression::{Lookup, parse_expression};

/// Evaluated parameters of an instance.
pub type ParamMap = IndexMap<String, RationalFunction>;

/// Read-only chain of evaluated parameter maps, searched nearest first.
#[derive(Debug, Clone, Default)]
pub(crate) struct ParamChain<'a> {
    maps: Vec<&'a ParamMap>,
}

impl<'a> ParamChain<'a> {
    pub(crate) fn new(maps: Vec<&'a ParamMap>) -> Self {
        Self { maps }
    }

    fn get(&self, name: &str) -> Option<&RationalFunction> {
        self.maps.iter().find_map(|m| m.get(name))
    }
}

impl Lookup for ParamChain<'_> {
    fn lookup(&mut self, name: &str) -> Result<RationalFunction, ParameterError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| ParameterError::Undefined(name.to_string()))
    }
}

/// Scope used while an instance's own defaults are being evaluated.
struct DefinitionScope<'a> {
    defs: &'a IndexMap<String, String>,
    values: ParamMap,
    outer: ParamChain<'a>,
    in_progress: Vec<String>,
}

impl Lookup for DefinitionScope<'_> {
    fn lookup(&mut self, name: &str) -> Result<RationalFunction, ParameterError> {
        if let Some(v) = self.values.get(name) {
            return Ok(v.clone());
        }
        let defs = self.defs;
        if let Some(expr) = defs.get(name) {
            if self.in_progress.iter().any(|n| n == name) {
                return Err(ParameterError::Circular(name.to_string()));
            }
            let value = if expr.trim() == name {
                RationalFunction::symbol(name)
            } else {
                self.in_progress.push(name.to_string());
                let result = evaluate(expr, self);
                self.in_progress.pop();
                result?
            };
            self.values.insert(name.to_string(), value.clone());
            return Ok(value);
        }
        self.outer.lookup(name)
    }
}

/// Evaluate an instance's parameters.
///
/// `passed` values win over the defaults in `defs`; defaults may reference
/// other defaults and anything visible through `outer`. The result holds the
/// passed values first, then the defaults in definition order.
pub(crate) fn evaluate_params(
    defs: &IndexMap<String, String>,
    passed: ParamMap,
    outer: ParamChain<'_>,
) -> Result<ParamMap, ParameterError> {
    let mut scope = DefinitionScope {
        defs,
        values: passed,
        outer,
        in_progress: Vec::new(),
    };
    for name in defs.keys() {
        scope.lookup(name)?;
    }
    Ok(scope.values)
}

/// Parse and evaluate a single expression.
pub(crate) fn evaluate<L: Lookup + ?Sized>(
    expr: &str,
    scope: &mut L,
) -> Result<RationalFunction, ParameterError> {
    let parsed = parse_expression(expr).map_err(|message| ParameterError::Syntax {
        expr: expr.to_string(),
        message,
    })?;
    parsed.eval(scope)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs(entries: &[(&str, &str)]) -> IndexMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sym(name: &str) -> RationalFunction {
        RationalFunction::symbol(name)
    }

    #[test]
    fn test_self_definition_is_symbol() {
        let values = evaluate_params(&defs(&[("R1", "R1")]), ParamMap::new(), ParamChain::default())
            .unwrap();
        assert_eq!(values["R1"], sym("R1"));
    }

    #[test]
    fn test_forward_reference() {
        let d = defs(&[("G", "1/R"), ("R", "2k")]);
        let values = evaluate_params(&d, ParamMap::new(), ParamChain::default()).unwrap();
        assert_eq!(
            values["G"],
            &RationalFunction::from_integer(1) / &RationalFunction::from_integer(2000)
        );
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_passed_values_win() {
        let d = defs(&[("R", "1k"), ("R2", "2*R")]);
        let passed = ParamMap::from([("R".to_string(), sym("Rx"))]);
        let values = evaluate_params(&d, passed, ParamChain::default()).unwrap();
        assert_eq!(values["R"], sym("Rx"));
        assert_eq!(values["R2"], &RationalFunction::from_integer(2) * &sym("Rx"));
        assert_eq!(values.get_index(0).map(|(k, _)| k.as_str()), Some("R"));
    }

    #[test]
    fn test_ancestor_fallback() {
        let parent = ParamMap::from([("Rp".to_string(), sym("Rp"))]);
        let d = defs(&[("R", "Rp/2")]);
        let values = evaluate_params(&d, ParamMap::new(), ParamChain::new(vec![&parent])).unwrap();
        assert_eq!(
            values["R"],
            &sym("Rp") / &RationalFunction::from_integer(2)
        );
    }

    #[test]
    fn test_nearest_ancestor_first() {
        let near = ParamMap::from([("k".to_string(), RationalFunction::from_integer(1))]);
        let far = ParamMap::from([("k".to_string(), RationalFunction::from_integer(2))]);
        let mut chain = ParamChain::new(vec![&near, &far]);
        assert_eq!(
            evaluate("k", &mut chain).unwrap(),
            RationalFunction::from_integer(1)
        );
    }

    #[test]
    fn test_circular_definition() {
        let d = defs(&[("a", "b + 1"), ("b", "2*a")]);
        let err = evaluate_params(&d, ParamMap::new(), ParamChain::default()).unwrap_err();
        assert!(matches!(err, ParameterError::Circular(_)));
    }

    #[test]
    fn test_undefined_reference() {
        let d = defs(&[("a", "missing * 2")]);
        let err = evaluate_params(&d, ParamMap::new(), ParamChain::default()).unwrap_err();
        assert!(matches!(err, ParameterError::Undefined(name) if name == "missing"));
    }

    #[test]
    fn test_syntax_error_reports_expression() {
        let err = evaluate("2 *", &mut ParamChain::default()).unwrap_err();
        assert!(matches!(err, ParameterError::Syntax { expr, .. } if expr == "2 *"));
    }
}
