//! In-memory settings engine
//!
//! Stands in for the external parameter/configuration engine the route
//! manager pushes criteria into. Criterion types and criteria are declared
//! while building the manager; once started, the engine accepts criterion
//! states and records a snapshot of all states at every apply request, which
//! makes the stage sequence of a reconsideration cycle fully inspectable
//! from tests and tooling.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use tracing::{debug, trace, warn};

use signalpath_core::domain::criteria::{CriteriaSink, SinkError};

#[derive(Debug, Clone)]
struct TypeDecl {
    inclusive: bool,
    pairs: Vec<(u32, String)>,
}

#[derive(Debug, Default)]
struct Inner {
    types: HashMap<String, TypeDecl>,
    /// criterion name -> criterion type name
    criterion_types: HashMap<String, String>,
    states: BTreeMap<String, u32>,
    applied: Vec<BTreeMap<String, u32>>,
    started: bool,
}

/// Recording implementation of the criteria sink
#[derive(Debug, Default)]
pub struct SettingsEngine {
    inner: Mutex<Inner>,
}

impl SettingsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.inner.lock().unwrap().started
    }

    /// Last pushed state of a criterion, if declared
    pub fn criterion_state(&self, name: &str) -> Option<u32> {
        self.inner.lock().unwrap().states.get(name).copied()
    }

    /// Number of apply requests seen so far
    pub fn apply_count(&self) -> usize {
        self.inner.lock().unwrap().applied.len()
    }

    /// Snapshots of all criterion states, one per apply request
    pub fn applied_snapshots(&self) -> Vec<BTreeMap<String, u32>> {
        self.inner.lock().unwrap().applied.clone()
    }

    /// History of one criterion across all apply requests
    pub fn applied_history(&self, name: &str) -> Vec<u32> {
        self.inner
            .lock()
            .unwrap()
            .applied
            .iter()
            .filter_map(|snapshot| snapshot.get(name).copied())
            .collect()
    }

}

impl CriteriaSink for SettingsEngine {
    fn add_criterion_type(&self, name: &str, inclusive: bool) {
        let mut inner = self.inner.lock().unwrap();
        if inner.started {
            warn!("not allowed while settings engine running");
            return;
        }
        if inner.types.contains_key(name) {
            trace!("criterion type {} already declared", name);
            return;
        }
        inner.types.insert(
            name.to_string(),
            TypeDecl {
                inclusive,
                pairs: Vec::new(),
            },
        );
    }

    fn add_criterion_type_value(&self, type_name: &str, literal: &str, numeric: u32) {
        let mut inner = self.inner.lock().unwrap();
        if inner.started {
            warn!("not allowed while settings engine running");
            return;
        }
        let Some(decl) = inner.types.get_mut(type_name) else {
            warn!("criterion type {} not declared", type_name);
            return;
        };
        if decl.pairs.iter().any(|(_, l)| l == literal) {
            return;
        }
        decl.pairs.push((numeric, literal.to_string()));
    }

    fn add_criterion(&self, name: &str, type_name: &str, initial: u32) {
        let mut inner = self.inner.lock().unwrap();
        if inner.started {
            warn!("not allowed while settings engine running");
            return;
        }
        inner
            .criterion_types
            .insert(name.to_string(), type_name.to_string());
        inner.states.insert(name.to_string(), initial);
    }

    fn start(&self) -> Result<(), SinkError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.started {
            debug!("settings engine already started");
            return Ok(());
        }
        for (criterion, type_name) in &inner.criterion_types {
            if !inner.types.contains_key(type_name) {
                return Err(SinkError::Declaration(format!(
                    "criterion {criterion} references unknown type {type_name}"
                )));
            }
        }
        inner.started = true;
        debug!("settings engine started");
        Ok(())
    }

    fn set_criterion(&self, name: &str, value: u32) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.criterion_types.contains_key(name) {
            warn!("state pushed for undeclared criterion {}", name);
            return;
        }
        inner.states.insert(name.to_string(), value);
    }

    fn apply_configurations(&self) {
        let mut inner = self.inner.lock().unwrap();
        let snapshot = inner.states.clone();
        trace!("applying configurations over {} criteria", snapshot.len());
        inner.applied.push(snapshot);
    }

    fn formatted_state(&self, type_name: &str, value: u32) -> String {
        let inner = self.inner.lock().unwrap();
        let Some(decl) = inner.types.get(type_name) else {
            return format!("<{value}>");
        };
        if decl.inclusive {
            let literals: Vec<&str> = decl
                .pairs
                .iter()
                .filter(|(n, _)| *n != 0 && value & n == *n)
                .map(|(_, l)| l.as_str())
                .collect();
            if literals.is_empty() {
                "none".to_string()
            } else {
                literals.join("|")
            }
        } else {
            decl.pairs
                .iter()
                .find(|(n, _)| *n == value)
                .map(|(_, l)| l.clone())
                .unwrap_or_else(|| format!("<{value}>"))
        }
    }
}
