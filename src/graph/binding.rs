//! Binding and Shard Schemas
//!
//! A task kind declares which upstream keys it reads through an ordered
//! binding schema, and (for array kinds) which input decides the shard count.

use crate::error::GraphError;

use super::value::ValueMap;

/// Layout value meaning reads are paired-end and interleaved R1, R2.
pub const PAIRED_END: &str = "pe";

/// One `(input-key, upstream-key)` pair of a binding schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// Key under which the value appears in the task's inputs
    pub input: &'static str,
    /// Key read from the merged upstream outputs
    pub source: &'static str,
    /// Absence of an optional source key is not an error
    pub required: bool,
}

impl Binding {
    pub const fn required(input: &'static str, source: &'static str) -> Self {
        Self {
            input,
            source,
            required: true,
        }
    }

    pub const fn optional(input: &'static str, source: &'static str) -> Self {
        Self {
            input,
            source,
            required: false,
        }
    }
}

/// Selects and renames upstream values according to `bindings`.
///
/// Only bound keys survive. A missing required source key fails with
/// [`GraphError::MissingKey`].
pub fn bind(task: &str, upstream: &ValueMap, bindings: &[Binding]) -> Result<ValueMap, GraphError> {
    let mut inputs = ValueMap::new();

    for binding in bindings {
        match upstream.get(binding.source) {
            Some(value) => {
                inputs.insert(binding.input, value.clone());
            }
            None if binding.required => {
                return Err(GraphError::MissingKey {
                    task: task.to_string(),
                    key: binding.source.to_string(),
                });
            }
            None => {}
        }
    }

    Ok(inputs)
}

/// Shard schema of an array task kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArraySpec {
    /// Input whose length is the number of shards
    pub cardinality_key: &'static str,
    /// Inputs that must hold exactly one entry per shard when present
    pub aligned_keys: &'static [&'static str],
    /// The cardinality list holds interleaved read pairs under a
    /// paired-end `layout`
    pub paired_reads: bool,
}

impl ArraySpec {
    pub const fn over(cardinality_key: &'static str) -> Self {
        Self {
            cardinality_key,
            aligned_keys: &[],
            paired_reads: false,
        }
    }

    pub const fn aligned_with(mut self, keys: &'static [&'static str]) -> Self {
        self.aligned_keys = keys;
        self
    }

    pub const fn with_paired_reads(mut self) -> Self {
        self.paired_reads = true;
        self
    }

    /// Computes the shard count from a task's inputs and checks that every
    /// aligned input has one entry per shard.
    pub fn shard_count(&self, task: &str, inputs: &ValueMap) -> Result<usize, GraphError> {
        let units = inputs.get_items(self.cardinality_key).len();

        let count = if self.paired_reads && inputs.get_str("layout") == Some(PAIRED_END) {
            if units % 2 != 0 {
                return Err(GraphError::UnpairedReads {
                    task: task.to_string(),
                    key: self.cardinality_key.to_string(),
                    found: units,
                });
            }
            units / 2
        } else {
            units
        };

        if count == 0 {
            return Err(GraphError::EmptyShards {
                task: task.to_string(),
                key: self.cardinality_key.to_string(),
            });
        }

        for key in self.aligned_keys {
            let Some(value) = inputs.get(key) else {
                continue;
            };
            let found = value.items().len();
            if found != count {
                return Err(GraphError::ShardMismatch {
                    task: task.to_string(),
                    key: key.to_string(),
                    expected: count,
                    found,
                });
            }
        }

        Ok(count)
    }
}
