//! Graph Validator and cascade planning over the registry forest

mod cascade;
mod validator;

pub use cascade::{plan_cascade, CascadeRequest};
pub use validator::{validate, ChainInfo, GraphIssue, GraphValidator, ValidationReport, DEFAULT_MAX_DEPTH};
