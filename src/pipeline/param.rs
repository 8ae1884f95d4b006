//! Parameter definitions and the value snapshot operators read from.

use crate::types::Frame;
use serde_json::Value;
use std::collections::BTreeMap;

/// What kind of value a parameter holds. Ranges are advisory: stored
/// values are kept verbatim and clamped by the operator that reads them.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Int { min: i64, max: i64 },
    Float { min: f64, max: f64 },
    Bool,
    Choice { options: Vec<String> },
    /// An image-valued slot, only ever fed by a connection.
    Image,
}

/// Static description of one parameter of an operator or algorithm node.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub kind: ParamKind,
    pub default: Value,
    /// Connectable parameters double as input ports.
    pub connectable: bool,
}

impl ParamDef {
    pub fn int(name: impl Into<String>, default: i64, min: i64, max: i64) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Int { min, max },
            default: Value::from(default),
            connectable: false,
        }
    }

    pub fn float(name: impl Into<String>, default: f64, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Float { min, max },
            default: Value::from(default),
            connectable: false,
        }
    }

    pub fn bool(name: impl Into<String>, default: bool) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Bool,
            default: Value::from(default),
            connectable: false,
        }
    }

    pub fn choice(
        name: impl Into<String>,
        default: &str,
        options: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Choice {
                options: options.iter().map(|s| s.to_string()).collect(),
            },
            default: Value::from(default),
            connectable: false,
        }
    }

    pub fn image(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Image,
            default: Value::Null,
            connectable: true,
        }
    }

    pub fn connectable(mut self) -> Self {
        self.connectable = true;
        self
    }
}

/// The per-invocation snapshot an operator reads from.
///
/// Built by the executor from the node's stored parameters plus any
/// values wired in over connections. Operators never see the node itself,
/// so a run cannot mutate the graph.
#[derive(Debug, Clone, Default)]
pub struct OpParams {
    values: BTreeMap<String, Value>,
    images: BTreeMap<String, Frame>,
}

impl OpParams {
    pub fn from_values(values: BTreeMap<String, Value>) -> Self {
        Self {
            values,
            images: BTreeMap::new(),
        }
    }

    pub fn set_value(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn set_image(&mut self, name: impl Into<String>, image: Frame) {
        self.images.insert(name.into(), image);
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn image(&self, name: &str) -> Option<&Frame> {
        self.images.get(name)
    }

    /// Integer lookup, coercing floats and numeric strings.
    pub fn get_i64(&self, name: &str, default: i64) -> i64 {
        match self.values.get(name) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Float lookup, coercing integers and numeric strings.
    pub fn get_f64(&self, name: &str, default: f64) -> f64 {
        match self.values.get(name) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.values.get(name) {
            Some(Value::Bool(b)) => *b,
            _ => default,
        }
    }

    pub fn get_str<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        match self.values.get(name) {
            Some(Value::String(s)) => s.as_str(),
            _ => default,
        }
    }
}
