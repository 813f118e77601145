//! Register bank flattening and access.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::sim::{Module, SignalId, SignalStore};

/// Access direction of a register, as seen from the controlling agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsrDirection {
    /// Read-only snapshot of an internal signal.
    Status,
    /// Read/write; the written value drives the bound signal.
    Storage,
}

/// One register declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrSpec {
    /// Flattened name, e.g. `pid_kp`.
    pub name: String,
    pub direction: CsrDirection,
    pub signal: SignalId,
}

/// A register as listed by [`CsrBank::entries`], with its current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrEntry {
    pub name: String,
    pub direction: CsrDirection,
    pub value: i64,
}

/// The flattened register bank of a design.
#[derive(Debug, Clone, Default)]
pub struct CsrBank {
    registers: BTreeMap<String, CsrSpec>,
}

impl CsrBank {
    /// Collect every register declared in `top` and its submodules.
    pub fn from_module(top: &Module) -> Result<Self, CsrError> {
        let mut registers = BTreeMap::new();
        for module in top.walk() {
            for spec in module.csrs() {
                if registers.insert(spec.name.clone(), spec.clone()).is_some() {
                    return Err(CsrError::Duplicate(spec.name.clone()));
                }
            }
        }
        Ok(Self { registers })
    }

    /// Look up a register declaration.
    pub fn get(&self, name: &str) -> Result<&CsrSpec, CsrError> {
        self.registers
            .get(name)
            .ok_or_else(|| CsrError::Unknown(name.to_string()))
    }

    /// Current value of any register.
    pub fn read(&self, store: &SignalStore, name: &str) -> Result<i64, CsrError> {
        Ok(store.read(self.get(name)?.signal))
    }

    /// Write a storage register. The value wraps into the signal's shape.
    ///
    /// Returns the signal that was written so the caller can re-settle.
    pub(crate) fn write(&self, store: &mut SignalStore, name: &str, value: i64) -> Result<SignalId, CsrError> {
        let spec = self.get(name)?;
        if spec.direction != CsrDirection::Storage {
            return Err(CsrError::ReadOnly(name.to_string()));
        }
        store.write(spec.signal, value as i128);
        Ok(spec.signal)
    }

    /// Every register declaration, in name order.
    pub fn specs(&self) -> impl Iterator<Item = &CsrSpec> {
        self.registers.values()
    }

    /// All storage registers, for driver validation.
    pub fn storage(&self) -> impl Iterator<Item = &CsrSpec> {
        self.registers
            .values()
            .filter(|spec| spec.direction == CsrDirection::Storage)
    }

    /// Snapshot of every register in name order.
    pub fn entries(&self, store: &SignalStore) -> Vec<CsrEntry> {
        self.registers
            .values()
            .map(|spec| CsrEntry {
                name: spec.name.clone(),
                direction: spec.direction,
                value: store.read(spec.signal),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

/// Errors raised by register access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsrError {
    #[error("no register named `{0}`")]
    Unknown(String),

    #[error("register `{0}` is a status register and cannot be written")]
    ReadOnly(String),

    #[error("register `{0}` declared twice")]
    Duplicate(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::Shape;
    use crate::sim::Design;

    fn design() -> (crate::sim::Design, SignalId, SignalId) {
        let (design, (enable, count)) = Design::build("top", |m| {
            let enable = m.storage("enable", Shape::BIT, 0)?;
            let count = m.signal("count", Shape::unsigned(4).unwrap())?;
            m.status("count", count);
            Ok((enable, count))
        })
        .unwrap();
        (design, enable, count)
    }

    #[test]
    fn test_read_write_storage() {
        let (design, enable, _) = design();
        let bank = CsrBank::from_module(design.top()).unwrap();
        let (mut store, _) = design.into_parts();

        assert_eq!(bank.read(&store, "enable").unwrap(), 0);
        assert_eq!(bank.write(&mut store, "enable", 3).unwrap(), enable);
        // one bit wide
        assert_eq!(bank.read(&store, "enable").unwrap(), 1);
    }

    #[test]
    fn test_status_is_read_only() {
        let (design, _, _) = design();
        let bank = CsrBank::from_module(design.top()).unwrap();
        let (mut store, _) = design.into_parts();

        let err = bank.write(&mut store, "count", 1).unwrap_err();
        assert_eq!(err, CsrError::ReadOnly("count".into()));
        assert!(matches!(bank.read(&store, "nope"), Err(CsrError::Unknown(_))));
    }

    #[test]
    fn test_entries_sorted() {
        let (design, _, _) = design();
        let bank = CsrBank::from_module(design.top()).unwrap();
        let entries = bank.entries(design.store());
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["count", "enable"]);
        assert_eq!(bank.storage().count(), 1);
    }

    #[test]
    fn test_duplicate_register() {
        let (design, _) = Design::build("top", |m| {
            let a = m.signal("a", Shape::BIT)?;
            m.status("a", a);
            m.status("a", a);
            Ok(())
        })
        .unwrap();
        assert_eq!(
            CsrBank::from_module(design.top()).unwrap_err(),
            CsrError::Duplicate("a".into())
        );
    }
}
