//! Hierarchical symbolic circuit solving for symcirc.
//!
//! A [`Template`] describes a circuit and its nested subcircuit definitions.
//! [`Circuit::new`] instantiates it into a tree of [`Instance`]s, and
//! [`Circuit::solve`] reduces every instance, children first, to an affine
//! function of its port voltages. Node voltages and branch currents are then
//! available as exact rational functions of the circuit parameters and the
//! frequency symbol `s`.
//!
//! ```
//! use symcirc_core::{Circuit, Template};
//! use symcirc_algebra::RationalFunction;
//!
//! let mut top = Template::new("divider");
//! top.symbols(&["R1", "R2", "vin"]);
//! top.element("V1", "in 0 vin").unwrap();
//! top.element("R1", "in out R1").unwrap();
//! top.element("R2", "out 0 R2").unwrap();
//!
//! let mut circuit = Circuit::new(&top).unwrap();
//! circuit.solve().unwrap();
//!
//! let r1 = RationalFunction::symbol("R1");
//! let r2 = RationalFunction::symbol("R2");
//! let vin = RationalFunction::symbol("vin");
//! let expected = &(&vin * &r2) / &(&r1 + &r2);
//! assert_eq!(circuit.voltage("out", None).unwrap(), expected);
//! ```

pub mod circuit;
mod connectivity;
pub mod element;
mod equation;
pub mod error;
pub mod expression;
pub mod instance;
mod params;
mod query;
mod solve;
pub mod template;

pub use circuit::{Circuit, SEPARATOR};
pub use element::{Element, ElementKind};
pub use error::{ElementError, InstanceError, ParameterError, Result, SolveError};
pub use instance::{Instance, InstanceId};
pub use params::ParamMap;
pub use query::PortRelation;
pub use template::{ElementTemplate, Template};

/// Name of the top-level reference net.
pub const GROUND: &str = "0";
