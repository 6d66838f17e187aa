//! Portable command parameters.
//!
//! A [`Parameter`] is engine independent; each kit translates it into its own
//! native parameter right before a command runs. The conversion registry in
//! [`param_type`] maps Rust value types to the portable [`ParamType`] tag and
//! back.

pub mod collection;
pub mod param_type;
pub mod parameter;

pub use collection::ParametersCollection;
pub use param_type::{FromRowValue, ParamType, ToParamValue};
pub use parameter::{Parameter, ParameterOptions};
