//! Write batches
//!
//! An ordered list of puts and deletes handed to [`super::Engine::write`]
//! as one atomic unit.

use crate::wal::Operation;

/// One mutation inside a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Ordered set of mutations applied atomically.
///
/// Operations apply in insertion order, so for a repeated key the last one
/// wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `key → Option<value>` rows; `None` deletes the key
    pub fn from_rows<I, K, V>(rows: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let mut batch = Self::new();
        for (key, value) in rows {
            match value {
                Some(v) => batch.put(key, v),
                None => batch.delete(key),
            };
        }
        batch
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Delete { key: key.into() });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BatchOp> {
        self.ops.iter()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// The batch as a single loggable operation
    pub(crate) fn to_operation(&self) -> Operation {
        Operation::Batch(
            self.ops
                .iter()
                .map(|op| match op {
                    BatchOp::Put { key, value } => Operation::Put {
                        key: key.clone(),
                        value: value.clone(),
                    },
                    BatchOp::Delete { key } => Operation::Delete { key: key.clone() },
                })
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a WriteBatch {
    type Item = &'a BatchOp;
    type IntoIter = std::slice::Iter<'a, BatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
