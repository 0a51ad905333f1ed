//! Criteria mirrored into the external configuration engine
//!
//! A `Criterion` is a named integer state; its `CriterionType` describes the
//! value space, either inclusive (a bitfield whose literals each name one
//! bit) or exclusive (a plain enumeration). The routing engine stages values
//! locally and only pushes them through the `CriteriaSink` when a
//! reconsideration cycle commits, so the external engine always sees a
//! consistent snapshot.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{trace, warn};

/// Routing stage bits pushed as the `RoutingStage` criterion
///
/// Muting sets `FLOW`, disabling sets `PATH`, configuring sets `CONFIGURE`,
/// enabling sets `PATH | CONFIGURE` and unmuting sets all three, so the
/// external engine can scope its configuration rules to the stage being
/// executed.
pub mod stages {
    pub const FLOW: u32 = 1 << 0;
    pub const PATH: u32 = 1 << 1;
    pub const CONFIGURE: u32 = 1 << 2;

    /// Literal/value pairs of the routing stage criterion type
    pub const VALUE_PAIRS: [(&str, u32); 3] =
        [("Flow", FLOW), ("Path", PATH), ("Configure", CONFIGURE)];
}

/// Name of the inclusive routing stage criterion and its type
pub const ROUTING_STAGE_CRITERION: &str = "RoutingStage";

/// Errors reported by the external criteria sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("configuration engine failed to start: {0}")]
    Start(String),

    #[error("invalid criteria declaration: {0}")]
    Declaration(String),
}

/// External configuration engine consumed by the route manager
///
/// Declarations happen while building the manager, before `start`; past that
/// point the engine only receives criterion states and apply requests.
pub trait CriteriaSink: Send + Sync {
    /// Declare a criterion type, inclusive (bitfield) or exclusive (enum)
    fn add_criterion_type(&self, name: &str, inclusive: bool);

    /// Register a literal/numeric pair on a declared criterion type
    fn add_criterion_type_value(&self, type_name: &str, literal: &str, numeric: u32);

    /// Declare a criterion of a declared type, with its initial state
    fn add_criterion(&self, name: &str, type_name: &str, initial: u32);

    /// Start the engine; declarations are frozen afterwards
    fn start(&self) -> Result<(), SinkError>;

    /// Push a criterion state; takes effect on the next apply
    fn set_criterion(&self, name: &str, value: u32);

    /// Re-evaluate the hardware configuration from the pushed states
    fn apply_configurations(&self);

    /// Debug rendition of a state for a declared type
    fn formatted_state(&self, type_name: &str, numeric: u32) -> String {
        let _ = type_name;
        numeric.to_string()
    }
}

/// Schema of a criterion: inclusive bitfield or exclusive enumeration
#[derive(Debug, Clone)]
pub struct CriterionType {
    name: String,
    inclusive: bool,
    pairs: Vec<(u32, String)>,
}

impl CriterionType {
    pub fn new(name: impl Into<String>, inclusive: bool) -> Self {
        Self {
            name: name.into(),
            inclusive,
            pairs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_inclusive(&self) -> bool {
        self.inclusive
    }

    /// Register a literal for an explicit numeric value
    ///
    /// A literal already registered is kept as-is, mirroring the fact that
    /// platform configurations may redeclare shared value pairs.
    pub fn add_value_pair(&mut self, numeric: u32, literal: &str) {
        if self.has_literal(literal) {
            trace!("value pair {} already added to {}", literal, self.name);
            return;
        }
        self.pairs.push((numeric, literal.to_string()));
    }

    /// Register a literal, auto-assigning the next value
    ///
    /// Inclusive types get increasing bit positions, exclusive types get
    /// increasing plain indices.
    pub fn append_value(&mut self, literal: &str) -> u32 {
        let numeric = if self.inclusive {
            1u32 << self.pairs.len()
        } else {
            self.pairs.len() as u32
        };
        self.add_value_pair(numeric, literal);
        numeric
    }

    pub fn has_literal(&self, literal: &str) -> bool {
        self.pairs.iter().any(|(_, l)| l == literal)
    }

    /// Numeric value registered for a literal, if any
    pub fn numeric_value(&self, literal: &str) -> Option<u32> {
        self.pairs
            .iter()
            .find(|(_, l)| l == literal)
            .map(|(n, _)| *n)
    }

    /// Literal registered for a numeric value, if any
    pub fn literal_value(&self, numeric: u32) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| *n == numeric)
            .map(|(_, l)| l.as_str())
    }

    /// Resolve a literal into a numeric state
    ///
    /// Falls back to parsing the literal as a number (decimal or `0x` hex)
    /// when it is not a registered pair; for exclusive types the parsed
    /// number must still be a registered value. Returns `None` on any
    /// failure so callers can substitute a default instead of crashing.
    pub fn numeric_from_literal(&self, literal: &str) -> Option<u32> {
        if literal.is_empty() {
            warn!("empty literal given for criterion type {}", self.name);
            return None;
        }
        if let Some(numeric) = self.numeric_value(literal) {
            return Some(numeric);
        }
        let parsed = if let Some(hex) = literal.strip_prefix("0x") {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            literal.parse::<u32>().ok()?
        };
        if self.inclusive || self.literal_value(parsed).is_some() {
            Some(parsed)
        } else {
            None
        }
    }

    /// Human-readable rendition of a state, for logs
    pub fn formatted_state(&self, value: u32) -> String {
        if self.inclusive {
            let literals: Vec<&str> = self
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
            self.literal_value(value)
                .map(str::to_string)
                .unwrap_or_else(|| format!("<{value}>"))
        }
    }
}

/// A named integer state staged locally and mirrored to the sink on commit
#[derive(Debug, Clone)]
pub struct Criterion {
    name: String,
    type_name: String,
    staged: u32,
    committed: Option<u32>,
}

impl Criterion {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, initial: u32) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            staged: initial,
            committed: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Last staged value; read-your-writes even before commit
    pub fn value(&self) -> u32 {
        self.staged
    }

    /// Last value pushed to the sink, if any
    pub fn committed(&self) -> Option<u32> {
        self.committed
    }

    /// Stage a new value without touching the sink
    ///
    /// Returns true when the staged value actually changed.
    pub fn set_value(&mut self, value: u32) -> bool {
        if self.staged == value {
            return false;
        }
        self.staged = value;
        true
    }

    /// Stage a value and push it to the sink when it changed
    pub fn set_state(&mut self, sink: &dyn CriteriaSink, value: u32) -> bool {
        if !self.set_value(value) {
            return false;
        }
        self.push(sink);
        true
    }

    /// Unconditionally push the staged value to the sink
    pub fn push(&mut self, sink: &dyn CriteriaSink) {
        sink.set_criterion(&self.name, self.staged);
        self.committed = Some(self.staged);
    }
}

/// The user-facing criteria of a platform, keyed by name
///
/// Lookups of unknown names panic: once the configuration is loaded, a
/// missing criterion is a programming error, not a runtime condition.
#[derive(Debug, Default)]
pub struct CriteriaSet {
    types: HashMap<String, CriterionType>,
    criteria: HashMap<String, Criterion>,
}

impl CriteriaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, criterion_type: CriterionType) -> bool {
        if self.types.contains_key(criterion_type.name()) {
            return false;
        }
        self.types
            .insert(criterion_type.name().to_string(), criterion_type);
        true
    }

    pub fn criterion_type(&self, name: &str) -> Option<&CriterionType> {
        self.types.get(name)
    }

    pub fn criterion_type_mut(&mut self, name: &str) -> Option<&mut CriterionType> {
        self.types.get_mut(name)
    }

    /// Add a criterion; its type must already be registered
    pub fn add_criterion(&mut self, name: &str, type_name: &str, initial: u32) -> bool {
        assert!(
            self.types.contains_key(type_name),
            "criterion type {type_name} not found for criterion {name}"
        );
        if self.criteria.contains_key(name) {
            return false;
        }
        self.criteria
            .insert(name.to_string(), Criterion::new(name, type_name, initial));
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.criteria.contains_key(name)
    }

    /// Stage a numeric value; panics on an unknown criterion
    pub fn set_value(&mut self, name: &str, value: u32) -> bool {
        self.criterion_mut(name).set_value(value)
    }

    /// Stage a literal value; false when the literal cannot be resolved
    pub fn set_literal(&mut self, name: &str, literal: &str) -> bool {
        let type_name = self.criterion(name).type_name().to_string();
        let Some(numeric) = self
            .criterion_type(&type_name)
            .and_then(|t| t.numeric_from_literal(literal))
        else {
            warn!("invalid value {} for criterion {}", literal, name);
            return false;
        };
        self.criterion_mut(name).set_value(numeric)
    }

    /// Last staged value; panics on an unknown criterion
    pub fn value(&self, name: &str) -> u32 {
        self.criterion(name).value()
    }

    /// Formatted state of a criterion, for logs
    pub fn formatted_value(&self, name: &str) -> String {
        let criterion = self.criterion(name);
        match self.types.get(criterion.type_name()) {
            Some(t) => t.formatted_state(criterion.value()),
            None => format!("<{}>", criterion.value()),
        }
    }

    /// Push every staged criterion to the sink
    pub fn commit(&mut self, sink: &dyn CriteriaSink) {
        for criterion in self.criteria.values_mut() {
            criterion.push(sink);
        }
    }

    /// Declare all types and criteria to the sink
    pub fn declare(&self, sink: &dyn CriteriaSink) {
        for criterion_type in self.types.values() {
            sink.add_criterion_type(criterion_type.name(), criterion_type.is_inclusive());
            for (numeric, literal) in &criterion_type.pairs {
                sink.add_criterion_type_value(criterion_type.name(), literal, *numeric);
            }
        }
        for criterion in self.criteria.values() {
            sink.add_criterion(criterion.name(), criterion.type_name(), criterion.value());
        }
    }

    fn criterion(&self, name: &str) -> &Criterion {
        self.criteria
            .get(name)
            .unwrap_or_else(|| panic!("criterion {name} not found"))
    }

    fn criterion_mut(&mut self, name: &str) -> &mut Criterion {
        self.criteria
            .get_mut(name)
            .unwrap_or_else(|| panic!("criterion {name} not found"))
    }
}
