//! Error types for symcirc-core.

use thiserror::Error;

/// Failure evaluating a parameter expression.
#[derive(Debug, Clone, Error)]
pub enum ParameterError {
    #[error("can't parse expression '{expr}': {message}")]
    Syntax { expr: String, message: String },

    #[error("can't find definition for parameter: {0}")]
    Undefined(String),

    #[error("circular reference for parameter: {0}")]
    Circular(String),

    #[error("unsupported expression: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Algebra(#[from] symcirc_algebra::Error),
}

/// Malformed element or an element-level equation that cannot be solved.
#[derive(Debug, Clone, Error)]
pub enum ElementError {
    #[error("{element}: port list is too long or too short (expected {expected} nets, got {actual})")]
    Arity {
        element: String,
        expected: usize,
        actual: usize,
    },

    #[error("{0}: missing value")]
    MissingValue(String),

    #[error("{0}: value must be non-zero")]
    ZeroValue(String),

    #[error("no such element {reference} referenced by {element}")]
    UnknownReference { element: String, reference: String },

    #[error("{0} is ill conditioned, and has no unique solution")]
    IllConditioned(String),

    #[error("{element}: {source}")]
    Parameter {
        element: String,
        source: ParameterError,
    },
}

/// Failure building, assembling or querying an instance.
#[derive(Debug, Clone, Error)]
pub enum InstanceError {
    #[error("error evaluating parameters in {circuit} subcircuit: {source}")]
    Parameter {
        circuit: String,
        source: ParameterError,
    },

    #[error("error building {element} in {circuit} subcircuit: {source}")]
    Element {
        circuit: String,
        element: String,
        source: ElementError,
    },

    #[error("in instance {instance}: {source}")]
    Nested {
        instance: String,
        source: Box<InstanceError>,
    },

    #[error("no subcircuit definition of {subcircuit} found for instance {instance} in {circuit} subcircuit")]
    UnknownSubcircuit {
        circuit: String,
        instance: String,
        subcircuit: String,
    },

    #[error("subcircuit {subcircuit} expects {expected} ports but {actual} provided (instance {instance})")]
    PortCount {
        instance: String,
        subcircuit: String,
        expected: usize,
        actual: usize,
    },

    #[error("no element of that type: {0}")]
    UnknownElementKind(String),

    #[error("duplicate name {name} in {circuit}")]
    DuplicateName { circuit: String, name: String },

    #[error("no {name} subinstance in {circuit}")]
    NoSuchInstance { circuit: String, name: String },

    #[error("no net {net} in {circuit}")]
    NoSuchNet { circuit: String, net: String },

    #[error("can't find element {element} in {circuit}")]
    NoSuchElement { circuit: String, element: String },

    #[error("no port {port} in subinstance {instance}")]
    NoSuchPort { instance: String, port: String },

    #[error("can't calculate port current from top circuit: {0}")]
    TopLevelPort(String),

    #[error("ill conditioned current controlled source {0}")]
    IllConditionedSource(String),

    #[error("circular current reference through {0}")]
    CircularCurrent(String),

    #[error("supernode through port {port} of {circuit} has no voltage equation")]
    UnresolvedSupernode { circuit: String, port: String },

    #[error("{0} has not been solved")]
    NotSolved(String),

    #[error("{circuit}: {source}")]
    Algebra {
        circuit: String,
        source: symcirc_algebra::Error,
    },
}

/// Failure of [`Circuit::solve`](crate::Circuit::solve).
#[derive(Debug, Clone, Error)]
pub enum SolveError {
    #[error("nets without connection to gnd: {}", .0.join(", "))]
    GroundPath(Vec<String>),

    #[error("voltage loop on nets: {0:?}")]
    VoltageLoops(Vec<Vec<String>>),

    #[error(transparent)]
    Element(#[from] ElementError),

    #[error(transparent)]
    Instance(#[from] InstanceError),
}

pub type Result<T> = std::result::Result<T, InstanceError>;
