use super::param_type::{ParamType, ToParamValue};
use crate::types::{ParameterDirection, RowValues, SourceVersion};

/// Optional fields of a [`Parameter`], grouped so callers set only what they
/// need.
///
/// ```rust
/// use db_tools::prelude::*;
///
/// let p = Parameter::with_options(
///     "@rows",
///     ParameterOptions {
///         param_type: ParamType::Int32,
///         direction: ParameterDirection::Output,
///         ..ParameterOptions::default()
///     },
/// );
/// assert!(p.value.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterOptions {
    pub param_type: ParamType,
    pub direction: ParameterDirection,
    pub size: i32,
    pub precision: u8,
    pub scale: u8,
    pub source_column: Option<String>,
    pub source_version: SourceVersion,
}

/// A named command parameter.
///
/// `value == None` means "no value set", which is not the same as
/// `Some(RowValues::Null)`. Kits bind an unset input value as SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParamType,
    pub direction: ParameterDirection,
    pub size: i32,
    pub precision: u8,
    pub scale: u8,
    pub source_column: Option<String>,
    pub source_version: SourceVersion,
    pub value: Option<RowValues>,
    pub is_nullable: bool,
}

impl Parameter {
    /// Untyped input parameter with no value.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, ParameterOptions::default())
    }

    #[must_use]
    pub fn with_options(name: impl Into<String>, options: ParameterOptions) -> Self {
        Self {
            name: name.into(),
            param_type: options.param_type,
            direction: options.direction,
            size: options.size,
            precision: options.precision,
            scale: options.scale,
            source_column: options.source_column,
            source_version: options.source_version,
            value: None,
            is_nullable: true,
        }
    }

    /// Input parameter typed after the Rust type of `value`.
    ///
    /// With `check_default`, a value equal to its type's default is sent as
    /// NULL.
    #[must_use]
    pub fn typed<T: ToParamValue>(name: impl Into<String>, value: T, check_default: bool) -> Self {
        let row_value = if check_default && value.is_default_value() {
            RowValues::Null
        } else {
            value.to_row_value()
        };
        Self::new(name)
            .with_type(T::param_type())
            .with_value(row_value)
    }

    /// Output parameter of the given type.
    #[must_use]
    pub fn output(name: impl Into<String>, param_type: ParamType) -> Self {
        Self::new(name)
            .with_type(param_type)
            .with_direction(ParameterDirection::Output)
    }

    #[must_use]
    pub fn with_type(mut self, param_type: ParamType) -> Self {
        self.param_type = param_type;
        self
    }

    #[must_use]
    pub fn with_direction(mut self, direction: ParameterDirection) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: i32) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_precision_scale(mut self, precision: u8, scale: u8) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    #[must_use]
    pub fn with_source_column(mut self, column: impl Into<String>, version: SourceVersion) -> Self {
        self.source_column = Some(column.into());
        self.source_version = version;
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: RowValues) -> Self {
        self.value = Some(value);
        self
    }

    /// Value to bind: the set value, or NULL when unset and the direction
    /// carries input.
    #[must_use]
    pub fn bind_value(&self) -> Option<RowValues> {
        match &self.value {
            Some(v) => Some(v.clone()),
            None if self.direction.accepts_input() => Some(RowValues::Null),
            None => None,
        }
    }
}
