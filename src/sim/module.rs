//! Modules and designs.
//!
//! A [`Module`] owns the signals it declares, the bindings that drive them,
//! the registers it exposes, and its submodules. Submodules are owned by
//! value, so a design is a plain tree with a single [`SignalStore`] at the
//! root. Modules are built through a [`ModuleBuilder`]:
//!
//! ```
//! use gatesim::logic::{bits_for, Expr, Shape};
//! use gatesim::sim::{Design, Simulator};
//!
//! let (design, counter) = Design::build("top", |m| {
//!     let counter = m.signal("counter", Shape::unsigned(bits_for(7)).unwrap())?;
//!     m.sync(counter, counter + 1);
//!     Ok(counter)
//! }).unwrap();
//!
//! let mut sim = Simulator::new(design).unwrap();
//! for _ in 0..9 {
//!     sim.step().unwrap();
//! }
//! assert_eq!(sim.peek(counter), 1);
//! ```

use serde::{Serialize, Deserialize};

use crate::csr::{CsrDirection, CsrSpec};
use crate::logic::{Expr, Shape};
use crate::sim::{SignalId, SignalStore, SimError};

/// An assignment of an expression to a target signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub target: SignalId,
    pub expr: Expr,
}

/// A named scope of signals, bindings, registers and submodules.
#[derive(Debug, Clone, Default)]
pub struct Module {
    name: String,
    path: String,
    csr_prefix: String,
    signals: Vec<SignalId>,
    comb: Vec<Binding>,
    sync: Vec<Binding>,
    csrs: Vec<CsrSpec>,
    submodules: Vec<Module>,
}

impl Module {
    /// Local name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted path from the top module.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Signals declared directly by this module.
    pub fn signals(&self) -> &[SignalId] {
        &self.signals
    }

    /// Combinational bindings, in declaration order.
    pub fn comb(&self) -> &[Binding] {
        &self.comb
    }

    /// Registered bindings, in declaration order.
    pub fn sync(&self) -> &[Binding] {
        &self.sync
    }

    /// Registers exposed by this module.
    pub fn csrs(&self) -> &[CsrSpec] {
        &self.csrs
    }

    pub fn submodules(&self) -> &[Module] {
        &self.submodules
    }

    /// Find a direct submodule by name.
    pub fn submodule(&self, name: &str) -> Option<&Module> {
        self.submodules.iter().find(|m| m.name == name)
    }

    /// This module and all of its descendants, depth first.
    pub fn walk(&self) -> Vec<&Module> {
        let mut out = vec![self];
        for child in &self.submodules {
            out.extend(child.walk());
        }
        out
    }
}

/// Builder handed to module construction closures.
///
/// The builder borrows the design's store, so signals declared in a
/// submodule land in the same store as the parent's.
pub struct ModuleBuilder<'a> {
    store: &'a mut SignalStore,
    module: Module,
}

impl<'a> ModuleBuilder<'a> {
    fn new(store: &'a mut SignalStore, name: &str, path: String, csr_prefix: String) -> Self {
        Self {
            store,
            module: Module {
                name: name.to_string(),
                path,
                csr_prefix,
                ..Module::default()
            },
        }
    }

    /// Declare a signal initialised to zero.
    pub fn signal(&mut self, name: &str, shape: Shape) -> Result<SignalId, SimError> {
        self.signal_with_reset(name, shape, 0)
    }

    /// Declare a signal with an explicit reset value.
    pub fn signal_with_reset(&mut self, name: &str, shape: Shape, reset: i64) -> Result<SignalId, SimError> {
        let full = format!("{}.{}", self.module.path, name);
        let id = self.store.create(&full, shape, reset)?;
        self.module.signals.push(id);
        Ok(id)
    }

    /// Declare a signal from a raw width; fails with [`SimError::Width`]
    /// for a width of zero or one that does not fit.
    pub fn signal_with_width(&mut self, name: &str, width: u32, signed: bool) -> Result<SignalId, SimError> {
        let full = format!("{}.{}", self.module.path, name);
        let id = self.store.create_with_width(&full, width, signed, 0)?;
        self.module.signals.push(id);
        Ok(id)
    }

    /// Drive `target` combinationally: it follows `expr` within the same cycle.
    pub fn comb(&mut self, target: SignalId, expr: impl Into<Expr>) {
        self.module.comb.push(Binding { target, expr: expr.into() });
    }

    /// Drive `target` from a register: `expr` is sampled this cycle and
    /// becomes visible on the next.
    pub fn sync(&mut self, target: SignalId, expr: impl Into<Expr>) {
        self.module.sync.push(Binding { target, expr: expr.into() });
    }

    /// Expose `signal` in the register bank as `<module path>_<name>`.
    pub fn csr(&mut self, name: &str, direction: CsrDirection, signal: SignalId) {
        self.module.csrs.push(CsrSpec {
            name: format!("{}{}", self.module.csr_prefix, name),
            direction,
            signal,
        });
    }

    /// Shorthand for a read/write register backed by a fresh signal.
    pub fn storage(&mut self, name: &str, shape: Shape, reset: i64) -> Result<SignalId, SimError> {
        let id = self.signal_with_reset(name, shape, reset)?;
        self.csr(name, CsrDirection::Storage, id);
        Ok(id)
    }

    /// Shorthand for exposing an existing signal read-only.
    pub fn status(&mut self, name: &str, signal: SignalId) {
        self.csr(name, CsrDirection::Status, signal);
    }

    /// Build a child module owned by this one.
    pub fn submodule<T, F>(&mut self, name: &str, build: F) -> Result<T, SimError>
    where
        F: FnOnce(&mut ModuleBuilder<'_>) -> Result<T, SimError>,
    {
        let path = format!("{}.{}", self.module.path, name);
        let prefix = format!("{}{}_", self.module.csr_prefix, name);
        let mut child = ModuleBuilder::new(&mut *self.store, name, path, prefix);
        let out = build(&mut child)?;
        self.module.submodules.push(child.module);
        Ok(out)
    }

    /// Read access to the shared store (shapes, names).
    pub fn store(&self) -> &SignalStore {
        &*self.store
    }

    /// Dotted path of the module being built.
    pub fn path(&self) -> &str {
        &self.module.path
    }
}

/// A complete design: the signal store plus the top module.
#[derive(Debug, Clone)]
pub struct Design {
    store: SignalStore,
    top: Module,
}

impl Design {
    /// Build a design by running `build` against a fresh top module.
    pub fn build<T, F>(name: &str, build: F) -> Result<(Design, T), SimError>
    where
        F: FnOnce(&mut ModuleBuilder<'_>) -> Result<T, SimError>,
    {
        let mut store = SignalStore::new();
        let (top, out) = {
            let mut builder = ModuleBuilder::new(&mut store, name, name.to_string(), String::new());
            let out = build(&mut builder)?;
            (builder.module, out)
        };
        Ok((Design { store, top }, out))
    }

    pub fn store(&self) -> &SignalStore {
        &self.store
    }

    pub fn top(&self) -> &Module {
        &self.top
    }

    pub(crate) fn into_parts(self) -> (SignalStore, Module) {
        (self.store, self.top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchical_names() {
        let (design, (a, b)) = Design::build("top", |m| {
            let a = m.signal("a", Shape::BIT)?;
            let b = m.submodule("child", |c| c.signal("b", Shape::BIT))?;
            Ok((a, b))
        })
        .unwrap();

        assert_eq!(design.store().name(a), "top.a");
        assert_eq!(design.store().name(b), "top.child.b");
        assert_eq!(design.top().submodules().len(), 1);
        assert_eq!(design.top().submodule("child").unwrap().path(), "top.child");
        assert_eq!(design.top().walk().len(), 2);
    }

    #[test]
    fn test_csr_prefixes() {
        let (design, _) = Design::build("top", |m| {
            m.storage("enable", Shape::BIT, 0)?;
            m.submodule("pid", |p| {
                p.storage("kp", Shape::signed(8).unwrap(), 1)?;
                p.submodule("inner", |i| i.storage("x", Shape::BIT, 0))
            })
        })
        .unwrap();

        let names: Vec<_> = design
            .top()
            .walk()
            .iter()
            .flat_map(|m| m.csrs().iter().map(|c| c.name.clone()))
            .collect();
        assert_eq!(names, vec!["enable", "pid_kp", "pid_inner_x"]);
    }

    #[test]
    fn test_zero_width_rejected() {
        let err = Design::build("top", |m| m.signal_with_width("bad", 0, false)).unwrap_err();
        assert!(matches!(err, SimError::Width { width: 0, .. }));
    }
}
