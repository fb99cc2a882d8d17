//! Reading secrets from the environment.

use std::collections::BTreeMap;
use std::ffi::OsString;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The name of an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct Variable(String);

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Variable {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let Variable(name) = self;
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("the environment variable {0} is not set")]
    NonExistentVariable(Variable),
    #[error("the environment variable {variable} is not valid unicode: {value:?}")]
    NonUnicodeValue { variable: Variable, value: OsString },
}

/// A source of environment variables.
pub trait Environment {
    fn read(&self, variable: &Variable) -> Result<String, Error>;
}

impl<E: Environment> Environment for &E {
    fn read(&self, variable: &Variable) -> Result<String, Error> {
        (*self).read(variable)
    }
}

/// The environment of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn read(&self, variable: &Variable) -> Result<String, Error> {
        std::env::var(variable.as_str()).map_err(|error| match error {
            std::env::VarError::NotPresent => Error::NonExistentVariable(variable.clone()),
            std::env::VarError::NotUnicode(value) => Error::NonUnicodeValue {
                variable: variable.clone(),
                value,
            },
        })
    }
}

/// A fixed set of variables, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct FixedEnvironment(BTreeMap<Variable, String>);

impl FixedEnvironment {
    pub fn new<K: Into<Variable>, V: Into<String>>(
        variables: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self(
            variables
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

impl Environment for FixedEnvironment {
    fn read(&self, variable: &Variable) -> Result<String, Error> {
        self.0
            .get(variable)
            .cloned()
            .ok_or_else(|| Error::NonExistentVariable(variable.clone()))
    }
}

/// An environment with no variables at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyEnvironment;

impl Environment for EmptyEnvironment {
    fn read(&self, variable: &Variable) -> Result<String, Error> {
        Err(Error::NonExistentVariable(variable.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_environment_reads_its_variables() {
        let environment = FixedEnvironment::new([("A", "1")]);
        assert_eq!(environment.read(&"A".into()), Ok("1".to_string()));
        assert_eq!(
            environment.read(&"B".into()),
            Err(Error::NonExistentVariable("B".into()))
        );
        assert!(EmptyEnvironment.read(&"A".into()).is_err());
    }
}
