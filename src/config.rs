use anyhow::{Context, Result};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::{fmt, fs, path::Path};

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Login credentials for paiza.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    email: String,
    password: String,
}

impl Configuration {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Self::from_document(&serde_yaml::from_str(content)?)
    }

    pub fn from_document(document: &Mapping) -> Result<Self> {
        Ok(serde_yaml::from_value(Value::Mapping(document.clone()))?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::from_document(&load_document(path)?)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Reads the config file as a plain YAML mapping, in the order it was written.
pub fn load_document(path: impl AsRef<Path>) -> Result<Mapping> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("invalid config file {}", path.display()))
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}
