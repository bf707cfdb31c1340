//! Property-based test generators and a reference model.
//!
//! Keys come from a deliberately small space so that generated sequences
//! revisit keys and exercise put/remove/clear interactions.

use proptest::prelude::*;
use std::collections::HashMap;
use txmap_core::{CoreResult, Overlay};

/// Key type used by generated operations.
pub type TestKey = u8;
/// Value type used by generated operations.
pub type TestValue = u16;

/// Number of distinct keys generated.
pub const KEY_SPACE: u8 = 8;

/// A map operation to run against an overlay and the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapOperation {
    /// Put a value.
    Put {
        /// Key written.
        key: TestKey,
        /// Value written.
        value: TestValue,
    },
    /// Remove a key.
    Remove {
        /// Key removed.
        key: TestKey,
    },
    /// Clear the map.
    Clear,
    /// Read a key.
    Get {
        /// Key read.
        key: TestKey,
    },
}

/// Strategy for generating keys.
pub fn key_strategy() -> impl Strategy<Value = TestKey> {
    0..KEY_SPACE
}

/// Strategy for generating a committed starting state.
pub fn initial_state_strategy() -> impl Strategy<Value = HashMap<TestKey, TestValue>> {
    prop::collection::hash_map(key_strategy(), any::<TestValue>(), 0..KEY_SPACE as usize)
}

/// Strategy for generating map operations.
pub fn operation_strategy() -> impl Strategy<Value = MapOperation> {
    prop_oneof![
        4 => (key_strategy(), any::<TestValue>())
            .prop_map(|(key, value)| MapOperation::Put { key, value }),
        3 => key_strategy().prop_map(|key| MapOperation::Remove { key }),
        1 => Just(MapOperation::Clear),
        2 => key_strategy().prop_map(|key| MapOperation::Get { key }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<MapOperation>> {
    prop::collection::vec(operation_strategy(), min_ops..max_ops)
}

/// Plain `HashMap` model of what a transaction should observe.
///
/// Starts from the committed state and applies every operation eagerly;
/// after the same operations, the overlay's transactional view and, after
/// commit, the store must equal the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelMap {
    entries: HashMap<TestKey, TestValue>,
}

impl ModelMap {
    /// Creates a model holding `entries`.
    pub fn new(entries: HashMap<TestKey, TestValue>) -> Self {
        Self { entries }
    }

    /// Applies an operation, returning what the overlay should return.
    pub fn apply(&mut self, op: &MapOperation) -> Option<TestValue> {
        match *op {
            MapOperation::Put { key, value } => self.entries.insert(key, value),
            MapOperation::Remove { key } => self.entries.remove(&key),
            MapOperation::Clear => {
                self.entries.clear();
                None
            }
            MapOperation::Get { key } => self.entries.get(&key).copied(),
        }
    }

    /// Returns the modelled entries.
    pub fn entries(&self) -> &HashMap<TestKey, TestValue> {
        &self.entries
    }
}

/// Runs an operation against an overlay, returning the value it reports.
///
/// # Errors
///
/// Propagates overlay errors.
pub fn apply_to_overlay<T>(
    overlay: &Overlay<TestKey, TestValue, T>,
    op: &MapOperation,
) -> CoreResult<Option<TestValue>>
where
    T: Eq + std::hash::Hash + Clone + std::fmt::Debug + 'static,
{
    match *op {
        MapOperation::Put { key, value } => overlay.put(key, value),
        MapOperation::Remove { key } => overlay.remove(&key),
        MapOperation::Clear => overlay.clear().map(|()| None),
        MapOperation::Get { key } => overlay.get(&key),
    }
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn keys_stay_in_key_space(key in key_strategy()) {
            prop_assert!(key < KEY_SPACE);
        }

        #[test]
        fn sequence_length_is_bounded(ops in operation_sequence_strategy(1, 10)) {
            prop_assert!(!ops.is_empty());
            prop_assert!(ops.len() < 10);
        }
    }

    #[test]
    fn model_put_remove_clear() {
        let mut model = ModelMap::new(HashMap::from([(1, 10)]));

        assert_eq!(model.apply(&MapOperation::Put { key: 1, value: 11 }), Some(10));
        assert_eq!(model.apply(&MapOperation::Remove { key: 1 }), Some(11));
        assert_eq!(model.apply(&MapOperation::Get { key: 1 }), None);
        model.apply(&MapOperation::Put { key: 2, value: 20 });
        model.apply(&MapOperation::Clear);
        assert!(model.entries().is_empty());
    }
}
