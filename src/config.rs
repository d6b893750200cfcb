//! Where the replacement literal comes from.
//!
//! Resolution happens on every transform, in order: the `MCMS_COUNT`
//! environment variable, the `mcms.count` property, then the plan's built-in
//! default. Nothing is cached, so a changed environment applies to the next
//! class load.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::num::IntErrorKind;

use crate::TransformError;

pub const COUNT_ENV: &str = "MCMS_COUNT";
pub const COUNT_PROPERTY: &str = "mcms.count";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplacementSource {
    Environment,
    Property,
    Default,
}

impl fmt::Display for ReplacementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplacementSource::Environment => write!(f, "environment variable {}", COUNT_ENV),
            ReplacementSource::Property => write!(f, "property {}", COUNT_PROPERTY),
            ReplacementSource::Default => write!(f, "built-in default"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Replacement {
    pub value: i64,
    pub origin: ReplacementSource,
}

/// System-property style settings, e.g. from an agent option string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Properties {
    values: HashMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Properties::default()
    }

    /// Parses `key=value,key=value`. A bare `key` is stored with an empty value.
    pub fn parse(options: &str) -> Self {
        let mut properties = Properties::new();
        for option in options.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            match option.split_once('=') {
                Some((key, value)) => properties.set(key.trim(), value.trim()),
                None => properties.set(option, ""),
            }
        }
        properties
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// The two override channels, consulted on every transform.
pub trait Overrides {
    fn env_override(&self) -> Option<String>;
    fn property_override(&self) -> Option<String>;

    fn resolve(&self, default: i64) -> Result<Replacement, TransformError> {
        if let Some(value) = self.env_override() {
            return parse_override(&value, ReplacementSource::Environment);
        }
        if let Some(value) = self.property_override() {
            return parse_override(&value, ReplacementSource::Property);
        }
        Ok(Replacement {
            value: default,
            origin: ReplacementSource::Default,
        })
    }
}

fn parse_override(value: &str, origin: ReplacementSource) -> Result<Replacement, TransformError> {
    match value.trim().parse::<i64>() {
        Ok(value) => Ok(Replacement { value, origin }),
        // A number, just far too wide for any operand.
        Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
            Err(TransformError::OperandOutOfRange {
                value: value.trim().to_string(),
                origin,
            })
        }
        Err(_) => Err(TransformError::InvalidOverride {
            value: value.to_string(),
            origin,
        }),
    }
}

/// Reads `MCMS_COUNT` from the live process environment and `mcms.count`
/// from the given properties.
#[derive(Clone, Debug, Default)]
pub struct ProcessOverrides {
    pub properties: Properties,
}

impl ProcessOverrides {
    pub fn new(properties: Properties) -> Self {
        ProcessOverrides { properties }
    }
}

impl Overrides for ProcessOverrides {
    fn env_override(&self) -> Option<String> {
        env::var(COUNT_ENV).ok()
    }

    fn property_override(&self) -> Option<String> {
        self.properties.get(COUNT_PROPERTY).map(str::to_string)
    }
}

/// Overrides fixed up front, for embedders that resolve settings themselves.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FixedOverrides {
    pub env: Option<String>,
    pub property: Option<String>,
}

impl FixedOverrides {
    pub fn none() -> Self {
        FixedOverrides::default()
    }

    pub fn env(value: &str) -> Self {
        FixedOverrides {
            env: Some(value.to_string()),
            property: None,
        }
    }

    pub fn property(value: &str) -> Self {
        FixedOverrides {
            env: None,
            property: Some(value.to_string()),
        }
    }
}

impl Overrides for FixedOverrides {
    fn env_override(&self) -> Option<String> {
        self.env.clone()
    }

    fn property_override(&self) -> Option<String> {
        self.property.clone()
    }
}
