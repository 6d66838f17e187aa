use std::collections::HashMap;
use std::fmt;

use super::param_type::{FromRowValue, ToParamValue};
use super::parameter::Parameter;
use crate::error::DbToolsError;
use crate::types::RowValues;

/// Ordered set of uniquely named parameters.
///
/// Iteration follows insertion order. Names are matched exactly.
#[derive(Debug, Clone, Default)]
pub struct ParametersCollection {
    items: Vec<Parameter>,
    index: HashMap<String, usize>,
}

impl ParametersCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter.
    ///
    /// # Errors
    /// Returns [`DbToolsError::ParameterError`] if the name is blank or a
    /// parameter with the same name is already present.
    pub fn add(&mut self, parameter: Parameter) -> Result<(), DbToolsError> {
        if parameter.name.trim().is_empty() {
            return Err(DbToolsError::ParameterError(
                "parameter name must not be blank".into(),
            ));
        }
        if self.index.contains_key(&parameter.name) {
            return Err(DbToolsError::ParameterError(format!(
                "parameter {} is already added",
                parameter.name
            )));
        }
        self.index.insert(parameter.name.clone(), self.items.len());
        self.items.push(parameter);
        Ok(())
    }

    /// Add a typed input parameter built by [`Parameter::typed`].
    ///
    /// # Errors
    /// Same as [`ParametersCollection::add`].
    pub fn add_value<T: ToParamValue>(
        &mut self,
        name: &str,
        value: T,
        check_default: bool,
    ) -> Result<(), DbToolsError> {
        self.add(Parameter::typed(name, value, check_default))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        match self.index.get(name) {
            Some(&i) => self.items.get_mut(i),
            None => None,
        }
    }

    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Typed value of parameter `name`; `Ok(None)` when it is unset or NULL.
    ///
    /// # Errors
    /// Returns [`DbToolsError::ParameterError`] for an unknown name and
    /// [`DbToolsError::ConversionError`] when the value cannot be read as `T`.
    pub fn value<T: FromRowValue>(&self, name: &str) -> Result<Option<T>, DbToolsError> {
        let parameter = self
            .get(name)
            .ok_or_else(|| DbToolsError::ParameterError(format!("unknown parameter {name}")))?;
        match &parameter.value {
            None | Some(RowValues::Null) => Ok(None),
            Some(v) => T::from_row_value(v).map(Some).ok_or_else(|| {
                DbToolsError::ConversionError(format!(
                    "parameter {name} holds {v:?}, which cannot be read as {}",
                    std::any::type_name::<T>()
                ))
            }),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }
}

impl<'a> IntoIterator for &'a ParametersCollection {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for ParametersCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.items {
            match &p.value {
                Some(v) => write!(f, "{}={v};", p.name)?,
                None => write!(f, "{}=;", p.name)?,
            }
        }
        Ok(())
    }
}
