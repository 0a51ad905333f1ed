//! Platform description loading
//!
//! A platform is described once, in a TOML file: the ports and their
//! mutual-exclusion groups, the backend and stream routes, and the criterion
//! types and criteria mirrored to the external configuration engine. The
//! description is validated while building the route collection; anything
//! inconsistent (duplicate names, references to unknown elements) is fatal
//! at load time since the platform could not route correctly.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::audio::{AudioDevice, Direction};
use crate::domain::collection::RouteCollection;
use crate::domain::criteria::{CriteriaSet, CriterionType};
use crate::domain::route::{StreamRoute, StreamRouteConfig};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or validating a platform description
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("duplicate port: {0}")]
    DuplicatePort(String),

    #[error("duplicate port group: {0}")]
    DuplicatePortGroup(String),

    #[error("unknown port: {0}")]
    UnknownPort(String),

    #[error("duplicate route {0} in {1}")]
    DuplicateRoute(String, Direction),

    #[error("too many routes in {0}")]
    TooManyRoutes(Direction),

    #[error("duplicate criterion type: {0}")]
    DuplicateCriterionType(String),

    #[error("duplicate criterion: {0}")]
    DuplicateCriterion(String),

    #[error("criterion type {type_name} not found for criterion {criterion}")]
    UnknownCriterionType {
        criterion: String,
        type_name: String,
    },
}

/// A hardware terminal declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortDecl {
    pub name: String,
}

/// A mutual-exclusion group declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortGroupDecl {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// A backend route declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecl {
    pub name: String,
    pub direction: Direction,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub sink: Option<String>,
}

/// A stream route declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRouteDecl {
    pub name: String,
    pub direction: Direction,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub sink: Option<String>,
    #[serde(default)]
    pub config: StreamRouteConfig,
}

/// One literal of a criterion type; the numeric value is auto-assigned when
/// omitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuePairDecl {
    pub literal: String,
    #[serde(default)]
    pub numeric: Option<u32>,
}

/// A criterion type declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionTypeDecl {
    pub name: String,
    #[serde(default)]
    pub inclusive: bool,
    #[serde(default)]
    pub values: Vec<ValuePairDecl>,
}

/// A criterion declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Default literal; an unknown literal falls back to zero
    #[serde(default)]
    pub default: Option<String>,
}

/// The whole platform description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub ports: Vec<PortDecl>,
    pub port_groups: Vec<PortGroupDecl>,
    pub routes: Vec<RouteDecl>,
    pub stream_routes: Vec<StreamRouteDecl>,
    pub criterion_types: Vec<CriterionTypeDecl>,
    pub criteria: Vec<CriterionDecl>,
}

impl PlatformConfig {
    pub fn from_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    /// Build the route collection, creating one device per stream route
    /// through the given factory
    pub fn build_collection(
        &self,
        device_factory: &mut dyn FnMut(&StreamRouteConfig) -> Box<dyn AudioDevice>,
    ) -> Result<RouteCollection> {
        let mut collection = RouteCollection::new();
        for port in &self.ports {
            collection.add_port(&port.name)?;
        }
        for group in &self.port_groups {
            collection.add_port_group(&group.name, &group.members)?;
        }
        for route in &self.routes {
            collection.add_backend_route(
                &route.name,
                route.direction,
                route.source.as_deref(),
                route.sink.as_deref(),
            )?;
        }
        for route in &self.stream_routes {
            let device = device_factory(&route.config);
            collection.add_stream_route(
                &route.name,
                route.direction,
                route.source.as_deref(),
                route.sink.as_deref(),
                StreamRoute::new(route.config.clone(), device),
            )?;
        }
        Ok(collection)
    }

    /// Build the criteria set declared by the platform
    pub fn build_criteria(&self) -> Result<CriteriaSet> {
        let mut set = CriteriaSet::new();
        for decl in &self.criterion_types {
            let mut criterion_type = CriterionType::new(&decl.name, decl.inclusive);
            for pair in &decl.values {
                match pair.numeric {
                    Some(numeric) => criterion_type.add_value_pair(numeric, &pair.literal),
                    None => {
                        criterion_type.append_value(&pair.literal);
                    }
                }
            }
            if !set.add_type(criterion_type) {
                return Err(ConfigError::DuplicateCriterionType(decl.name.clone()));
            }
        }
        for decl in &self.criteria {
            let criterion_type = set.criterion_type(&decl.type_name).ok_or_else(|| {
                ConfigError::UnknownCriterionType {
                    criterion: decl.name.clone(),
                    type_name: decl.type_name.clone(),
                }
            })?;
            let initial = match &decl.default {
                Some(literal) => criterion_type.numeric_from_literal(literal).unwrap_or_else(|| {
                    warn!(
                        "unknown default {} for criterion {}, using 0",
                        literal, decl.name
                    );
                    0
                }),
                None => 0,
            };
            if !set.add_criterion(&decl.name, &decl.type_name, initial) {
                return Err(ConfigError::DuplicateCriterion(decl.name.clone()));
            }
        }
        Ok(set)
    }
}
