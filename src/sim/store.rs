//! Signal/register storage.
//!
//! Every signal in a design lives in one [`SignalStore`], indexed by a
//! [`SignalId`]. Writes are masked to the signal's shape, so the stored value
//! always fits its width.

use std::collections::HashMap;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::logic::{Shape, MAX_WIDTH};
use crate::sim::SimError;

/// Handle to a signal in a [`SignalStore`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(u32);

impl SignalId {
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Static description of a stored signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalInfo {
    /// Hierarchical name, e.g. `top.pid.integral`.
    pub name: String,
    pub shape: Shape,
    /// Value restored on reset.
    pub reset: i64,
}

/// Backing store for all signals of a design.
#[derive(Clone, Default)]
pub struct SignalStore {
    info: Vec<SignalInfo>,
    values: Vec<i64>,
    by_name: HashMap<String, SignalId>,
}

impl SignalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a signal of `shape`, initialised to `reset` (wrapped).
    pub fn create(&mut self, name: &str, shape: Shape, reset: i64) -> Result<SignalId, SimError> {
        if shape.width() == 0 || shape.width() > MAX_WIDTH {
            return Err(SimError::Width { name: name.to_string(), width: shape.width() });
        }
        if self.by_name.contains_key(name) {
            return Err(SimError::DuplicateSignal(name.to_string()));
        }

        let id = SignalId(self.values.len() as u32);
        let reset = shape.wrap(reset as i128);
        self.info.push(SignalInfo { name: name.to_string(), shape, reset });
        self.values.push(reset);
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Allocate a signal from a raw width, failing with
    /// [`SimError::Width`] if the width is unusable.
    pub fn create_with_width(
        &mut self,
        name: &str,
        width: u32,
        signed: bool,
        reset: i64,
    ) -> Result<SignalId, SimError> {
        let shape = Shape::new(width, signed)
            .ok_or_else(|| SimError::Width { name: name.to_string(), width })?;
        self.create(name, shape, reset)
    }

    /// Current value of a signal.
    ///
    /// # Panics
    /// Panics if `id` came from a different store.
    #[inline]
    pub fn read(&self, id: SignalId) -> i64 {
        self.values[id.index()]
    }

    /// Write a value, wrapping it into the signal's shape.
    ///
    /// Returns `true` if the stored value changed.
    #[inline]
    pub(crate) fn write(&mut self, id: SignalId, value: i128) -> bool {
        let wrapped = self.info[id.index()].shape.wrap(value);
        let slot = &mut self.values[id.index()];
        let changed = *slot != wrapped;
        *slot = wrapped;
        changed
    }

    /// Restore every signal to its reset value.
    pub(crate) fn reset(&mut self) {
        for (value, info) in self.values.iter_mut().zip(&self.info) {
            *value = info.reset;
        }
    }

    pub fn info(&self, id: SignalId) -> &SignalInfo {
        &self.info[id.index()]
    }

    pub fn shape(&self, id: SignalId) -> Shape {
        self.info[id.index()].shape
    }

    pub fn name(&self, id: SignalId) -> &str {
        &self.info[id.index()].name
    }

    /// Look up a signal by its hierarchical name.
    pub fn find(&self, name: &str) -> Option<SignalId> {
        self.by_name.get(name).copied()
    }

    /// Number of signals.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all signal ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = SignalId> + '_ {
        (0..self.values.len() as u32).map(SignalId)
    }

    /// Check that `id` belongs to this store.
    pub fn contains(&self, id: SignalId) -> bool {
        id.index() < self.values.len()
    }
}

impl fmt::Debug for SignalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalStore")
            .field("signals", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_create_and_read_reset() {
        let mut store = SignalStore::new();
        let a = store.create("a", Shape::unsigned(4).unwrap(), 3).unwrap();
        let b = store.create("b", Shape::signed(4).unwrap(), 9).unwrap();

        assert_eq!(store.read(a), 3);
        assert_eq!(store.read(b), -7); // 9 wraps in s4
        assert_eq!(store.find("b"), Some(b));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_width_error() {
        let mut store = SignalStore::new();
        let err = store.create_with_width("zero", 0, false, 0).unwrap_err();
        assert!(matches!(err, SimError::Width { width: 0, .. }));

        let err = store.create_with_width("huge", 64, true, 0).unwrap_err();
        assert!(matches!(err, SimError::Width { width: 64, .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_name() {
        let mut store = SignalStore::new();
        store.create("x", Shape::BIT, 0).unwrap();
        let err = store.create("x", Shape::BIT, 0).unwrap_err();
        assert!(matches!(err, SimError::DuplicateSignal(_)));
    }

    #[test]
    fn test_write_reports_change() {
        let mut store = SignalStore::new();
        let a = store.create("a", Shape::unsigned(3).unwrap(), 0).unwrap();
        assert!(store.write(a, 8 + 5));
        assert_eq!(store.read(a), 5);
        assert!(!store.write(a, 5));

        store.reset();
        assert_eq!(store.read(a), 0);
    }

    proptest! {
        #[test]
        fn unsigned_write_reads_back_modulo(width in 1u32..=63, n in any::<i64>()) {
            let mut store = SignalStore::new();
            let id = store.create_with_width("s", width, false, 0).unwrap();
            store.write(id, n as i128);
            prop_assert_eq!(store.read(id) as i128, (n as i128).rem_euclid(1i128 << width));
        }

        #[test]
        fn signed_write_stays_in_range(width in 1u32..=63, n in any::<i64>()) {
            let mut store = SignalStore::new();
            let id = store.create_with_width("s", width, true, 0).unwrap();
            store.write(id, n as i128);
            let v = store.read(id);
            prop_assert!(v >= -(1i64 << (width - 1)));
            prop_assert!(v <= (1i64 << (width - 1)) - 1);
        }
    }
}
