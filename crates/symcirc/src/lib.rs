//! # Symcirc
//!
//! A hierarchical symbolic circuit solver written in Rust.
//!
//! Symcirc solves linear circuits for exact closed-form results:
//! - Node voltages and branch currents as rational functions
//! - Circuit parameters kept as free symbols
//! - Reactive elements in the Laplace variable `s`
//! - Nested subcircuits reduced bottom-up to their ports
//!
//! ## Quick Start
//!
//! ```rust
//! use symcirc::prelude::*;
//!
//! let mut top = Template::new("lowpass");
//! top.symbols(&["R", "C"]);
//! top.element("V1", "in 0 1").unwrap();
//! top.element("R1", "in out R").unwrap();
//! top.element("C1", "out 0 C").unwrap();
//!
//! let mut circuit = Circuit::new(&top).unwrap();
//! circuit.solve().unwrap();
//! let h = circuit.voltage("out", None).unwrap();
//! println!("H(s) = {}", h);
//! ```
//!
//! ## Evaluating Results
//!
//! ```rust,ignore
//! use std::collections::HashMap;
//!
//! let values = HashMap::from([
//!     ("R".to_string(), Complex64::new(1e3, 0.0)),
//!     ("C".to_string(), Complex64::new(1e-6, 0.0)),
//!     ("s".to_string(), Complex64::new(0.0, 1e3)),
//! ]);
//! let gain = h.eval(&values)?.norm();
//! ```

// Re-export member crates
pub use symcirc_algebra as algebra;
pub use symcirc_core as core;

// ============================================================================
// Convenient re-exports from symcirc_algebra
// ============================================================================

pub use symcirc_algebra::{
    // Errors
    Error as AlgebraError,
    // Frequency symbol
    FREQUENCY,
    Monomial,
    Polynomial,
    // Symbolic values
    RationalFunction,
};

// ============================================================================
// Convenient re-exports from symcirc_core
// ============================================================================

pub use symcirc_core::{
    // Circuit representation
    Circuit,
    Element,
    ElementKind,
    // Errors
    ElementError,
    // Templates
    ElementTemplate,
    GROUND,
    Instance,
    InstanceError,
    InstanceId,
    ParamMap,
    ParameterError,
    // Query results
    PortRelation,
    SEPARATOR,
    SolveError,
    Template,
};

// ============================================================================
// Re-export commonly used external types
// ============================================================================

/// Re-export of nalgebra's dynamic vector type.
pub use nalgebra::DVector;

/// Re-export of nalgebra's dynamic matrix type.
pub use nalgebra::DMatrix;

/// Re-export of num_complex's double precision complex type.
pub use num_complex::Complex64;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Prelude module containing commonly used types.
///
/// ```rust
/// use symcirc::prelude::*;
/// ```
pub mod prelude {
    // Templates
    pub use crate::{ElementTemplate, Template};

    // Circuit and queries
    pub use crate::{Circuit, Instance, InstanceId, PortRelation};

    // Errors
    pub use crate::{ElementError, InstanceError, ParameterError, SolveError};

    // Symbolic values
    pub use crate::{FREQUENCY, RationalFunction};

    // Common external types
    pub use crate::{Complex64, DMatrix, DVector};
}
