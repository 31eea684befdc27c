use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A typed scene, world, light or material parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parameter {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec4([f32; 4]),
}

impl Parameter {
    /// Flag view of the value: booleans directly, numbers through their first
    /// component being non-zero.
    pub fn as_bool(&self) -> bool {
        match *self {
            Parameter::Bool(value) => value,
            Parameter::Int(value) => value != 0,
            Parameter::Float(value) => value != 0.0,
            Parameter::Vec4(value) => value[0] != 0.0,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Parameter::Int(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match *self {
            Parameter::Float(value) => Some(value),
            Parameter::Int(value) => Some(value as f32),
            _ => None,
        }
    }

    pub fn as_vec4(&self) -> Option<[f32; 4]> {
        match *self {
            Parameter::Vec4(value) => Some(value),
            _ => None,
        }
    }
}

/// Name to value mapping for one parameter namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterNamespace {
    values: BTreeMap<String, Parameter>,
}

impl ParameterNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Parameter) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: Parameter) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn int(&self, name: &str) -> Result<Option<i32>> {
        self.typed(name, "an integer", Parameter::as_int)
    }

    pub fn float(&self, name: &str) -> Result<Option<f32>> {
        self.typed(name, "a float", Parameter::as_float)
    }

    pub fn vec4(&self, name: &str) -> Result<Option<[f32; 4]>> {
        self.typed(name, "a 4 component vector", Parameter::as_vec4)
    }

    fn typed<T>(
        &self,
        name: &str,
        expected: &'static str,
        read: impl Fn(&Parameter) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(value) => read(value).map(Some).ok_or_else(|| PipelineError::ParameterType {
                name: name.to_owned(),
                expected,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_parameters_read_as_floats() {
        let params = ParameterNamespace::new().with("Samples Width", Parameter::Int(2));
        assert_eq!(params.float("Samples Width").unwrap(), Some(2.0));
    }

    #[test]
    fn wrong_type_is_reported_with_name() {
        let params = ParameterNamespace::new().with("Transparency Layers", Parameter::Float(1.5));
        let err = params.int("Transparency Layers").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ParameterType { ref name, .. } if name == "Transparency Layers"
        ));
    }

    #[test]
    fn missing_parameters_are_none() {
        let params = ParameterNamespace::new();
        assert_eq!(params.vec4("Background Color").unwrap(), None);
    }

    #[test]
    fn json_values_pick_the_narrowest_variant() {
        let params: ParameterNamespace =
            serde_json::from_str(r#"{"a": true, "b": 4, "c": 1.5, "d": [0, 0, 0, 1]}"#).unwrap();
        assert_eq!(params.get("a"), Some(&Parameter::Bool(true)));
        assert_eq!(params.get("b"), Some(&Parameter::Int(4)));
        assert_eq!(params.get("c"), Some(&Parameter::Float(1.5)));
        assert_eq!(params.get("d"), Some(&Parameter::Vec4([0.0, 0.0, 0.0, 1.0])));
    }

    #[test]
    fn flags_read_first_component() {
        assert!(Parameter::Vec4([1.0, 0.0, 0.0, 0.0]).as_bool());
        assert!(!Parameter::Int(0).as_bool());
        assert!(Parameter::Bool(true).as_bool());
    }
}
