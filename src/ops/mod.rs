//! Operator library.
//!
//! Each operator is a pure function over an image plus a parameter
//! snapshot. The registry maps operator names (as they appear on process
//! nodes) to their implementations and parameter schemas, and is the only
//! party that knows which operators emit a secondary data output.

mod analyze;
mod arith;
mod blur;
mod morphology;
mod threshold;
mod transform;

use crate::pipeline::param::{OpParams, ParamDef};
use crate::types::Frame;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// What an operator produced.
#[derive(Debug, Clone)]
pub enum OpOutput {
    Image(Frame),
    /// An image plus structured measurements, e.g. per-object statistics.
    WithData { image: Frame, data: Value },
}

impl OpOutput {
    pub fn image(&self) -> &Frame {
        match self {
            OpOutput::Image(image) => image,
            OpOutput::WithData { image, .. } => image,
        }
    }

    pub fn into_parts(self) -> (Frame, Option<Value>) {
        match self {
            OpOutput::Image(image) => (image, None),
            OpOutput::WithData { image, data } => (image, Some(data)),
        }
    }
}

type ApplyFn = fn(&OpParams, &Frame) -> anyhow::Result<OpOutput>;

/// Static description of one registered operator.
pub struct OperatorSpec {
    pub name: &'static str,
    pub category: &'static str,
    /// True when the operator produces a secondary "data" output port.
    pub emits_data: bool,
    pub params: fn() -> Vec<ParamDef>,
    pub apply: ApplyFn,
}

/// Name-keyed lookup for every operator the engine can run.
pub struct OperatorRegistry {
    ops: HashMap<&'static str, OperatorSpec>,
}

impl OperatorRegistry {
    pub fn empty() -> Self {
        Self {
            ops: HashMap::new(),
        }
    }

    /// A registry populated with the builtin operator set.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        arith::register(&mut registry);
        blur::register(&mut registry);
        threshold::register(&mut registry);
        morphology::register(&mut registry);
        transform::register(&mut registry);
        analyze::register(&mut registry);
        registry
    }

    pub fn register(&mut self, spec: OperatorSpec) {
        self.ops.insert(spec.name, spec);
    }

    pub fn get(&self, name: &str) -> Option<&OperatorSpec> {
        self.ops.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Whether the named operator exposes a secondary "data" output.
    /// Unknown names do not.
    pub fn emits_data(&self, name: &str) -> bool {
        self.ops.get(name).map(|s| s.emits_data).unwrap_or(false)
    }

    /// Parameter schema for the named operator, empty when unknown.
    pub fn param_defs(&self, name: &str) -> Vec<ParamDef> {
        self.ops.get(name).map(|s| (s.params)()).unwrap_or_default()
    }

    /// Run the named operator. An unknown name is not fatal: the input
    /// passes through unchanged so the rest of the pipeline keeps working.
    pub fn apply(
        &self,
        name: &str,
        params: &OpParams,
        frame: &Frame,
    ) -> anyhow::Result<OpOutput> {
        match self.ops.get(name) {
            Some(spec) => (spec.apply)(params, frame),
            None => {
                warn!(operator = name, "unknown operator, passing image through");
                Ok(OpOutput::Image(frame.clone()))
            }
        }
    }

    /// Registered operator names, sorted for stable presentation.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.ops.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
