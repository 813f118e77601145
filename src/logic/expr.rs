//! Right-hand-side expressions for signal bindings.
//!
//! Expressions are evaluated in `i128` with no intermediate width; the result
//! is wrapped to the target signal's [`Shape`] when it is written. Operators
//! are overloaded on both [`Expr`] and [`SignalId`] so a binding reads close
//! to the circuit it describes:
//!
//! ```
//! use gatesim::logic::{Expr, Shape};
//! use gatesim::sim::Design;
//!
//! let (design, counter) = Design::build("top", |m| {
//!     let counter = m.signal("counter", Shape::unsigned(3).unwrap())?;
//!     m.sync(counter, counter + 1);
//!     Ok(counter)
//! }).unwrap();
//! # let _ = (design, counter);
//! ```

use std::ops;
use serde::{Serialize, Deserialize};

use crate::logic::Shape;
use crate::sim::{SignalId, SignalStore};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// An expression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    /// Integer constant.
    Lit(i64),
    /// Current value of a signal.
    Sig(SignalId),
    /// Binary operation.
    Bin(BinOp, Box<Expr>, Box<Expr>),
    /// Bitwise inversion of the unbounded intermediate.
    ///
    /// The operand has no width here, so `!x` on a `u3` holding 7 is -8, not
    /// 0. Compare against the wrapped result, or use `x ^ mask` for an
    /// inversion limited to the operand's bits.
    Not(Box<Expr>),
    /// Left shift by a constant amount.
    Shl(Box<Expr>, u32),
    /// Arithmetic right shift by a constant amount.
    Shr(Box<Expr>, u32),
    /// `cond != 0 ? then : otherwise`
    Mux(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Clamp into the range of a shape.
    Saturate(Box<Expr>, Shape),
}

impl Expr {
    /// Integer literal.
    pub fn lit(value: i64) -> Self {
        Expr::Lit(value)
    }

    /// Signal reference.
    pub fn sig(id: SignalId) -> Self {
        Expr::Sig(id)
    }

    /// Two-way selection, the `If(cond, ...).Else(...)` of a netlist.
    pub fn mux(cond: impl Into<Expr>, then: impl Into<Expr>, otherwise: impl Into<Expr>) -> Self {
        Expr::Mux(
            Box::new(cond.into()),
            Box::new(then.into()),
            Box::new(otherwise.into()),
        )
    }

    /// Clamp `self` into `shape` instead of letting it wrap.
    pub fn saturate(self, shape: Shape) -> Self {
        Expr::Saturate(Box::new(self), shape)
    }

    fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Bin(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn equals(self, rhs: impl Into<Expr>) -> Self {
        Self::bin(BinOp::Eq, self, rhs.into())
    }

    pub fn not_equals(self, rhs: impl Into<Expr>) -> Self {
        Self::bin(BinOp::Ne, self, rhs.into())
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Self {
        Self::bin(BinOp::Lt, self, rhs.into())
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Self {
        Self::bin(BinOp::Le, self, rhs.into())
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Self {
        Self::bin(BinOp::Gt, self, rhs.into())
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Self {
        Self::bin(BinOp::Ge, self, rhs.into())
    }

    /// Evaluate against the current contents of `store`.
    ///
    /// Arithmetic wraps at 128 bits, which is congruent to the final
    /// wrap into any target shape.
    pub fn eval(&self, store: &SignalStore) -> i128 {
        match self {
            Expr::Lit(v) => *v as i128,
            Expr::Sig(id) => store.read(*id) as i128,
            Expr::Bin(op, lhs, rhs) => {
                let a = lhs.eval(store);
                let b = rhs.eval(store);
                match op {
                    BinOp::Add => a.wrapping_add(b),
                    BinOp::Sub => a.wrapping_sub(b),
                    BinOp::Mul => a.wrapping_mul(b),
                    BinOp::And => a & b,
                    BinOp::Or => a | b,
                    BinOp::Xor => a ^ b,
                    BinOp::Eq => (a == b) as i128,
                    BinOp::Ne => (a != b) as i128,
                    BinOp::Lt => (a < b) as i128,
                    BinOp::Le => (a <= b) as i128,
                    BinOp::Gt => (a > b) as i128,
                    BinOp::Ge => (a >= b) as i128,
                }
            }
            Expr::Not(inner) => !inner.eval(store),
            Expr::Shl(inner, n) => inner.eval(store).checked_shl(*n).unwrap_or(0),
            // i128 >> is arithmetic, so signed operands keep their sign
            Expr::Shr(inner, n) => inner.eval(store) >> (*n).min(127),
            Expr::Mux(cond, then, otherwise) => {
                if cond.eval(store) != 0 {
                    then.eval(store)
                } else {
                    otherwise.eval(store)
                }
            }
            Expr::Saturate(inner, shape) => shape.saturate(inner.eval(store)) as i128,
        }
    }

    /// Append every signal this expression reads to `out`.
    pub fn sources(&self, out: &mut Vec<SignalId>) {
        match self {
            Expr::Lit(_) => {}
            Expr::Sig(id) => out.push(*id),
            Expr::Bin(_, lhs, rhs) => {
                lhs.sources(out);
                rhs.sources(out);
            }
            Expr::Not(inner)
            | Expr::Shl(inner, _)
            | Expr::Shr(inner, _)
            | Expr::Saturate(inner, _) => inner.sources(out),
            Expr::Mux(cond, then, otherwise) => {
                cond.sources(out);
                then.sources(out);
                otherwise.sources(out);
            }
        }
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Lit(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Lit(value as i64)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Lit(value as i64)
    }
}

impl From<SignalId> for Expr {
    fn from(id: SignalId) -> Self {
        Expr::Sig(id)
    }
}

impl From<&Expr> for Expr {
    fn from(expr: &Expr) -> Self {
        expr.clone()
    }
}

macro_rules! impl_expr_ops {
    ($lhs:ty) => {
        impl<R: Into<Expr>> ops::Add<R> for $lhs {
            type Output = Expr;
            fn add(self, rhs: R) -> Expr {
                Expr::bin(BinOp::Add, self.into(), rhs.into())
            }
        }

        impl<R: Into<Expr>> ops::Sub<R> for $lhs {
            type Output = Expr;
            fn sub(self, rhs: R) -> Expr {
                Expr::bin(BinOp::Sub, self.into(), rhs.into())
            }
        }

        impl<R: Into<Expr>> ops::Mul<R> for $lhs {
            type Output = Expr;
            fn mul(self, rhs: R) -> Expr {
                Expr::bin(BinOp::Mul, self.into(), rhs.into())
            }
        }

        impl<R: Into<Expr>> ops::BitAnd<R> for $lhs {
            type Output = Expr;
            fn bitand(self, rhs: R) -> Expr {
                Expr::bin(BinOp::And, self.into(), rhs.into())
            }
        }

        impl<R: Into<Expr>> ops::BitOr<R> for $lhs {
            type Output = Expr;
            fn bitor(self, rhs: R) -> Expr {
                Expr::bin(BinOp::Or, self.into(), rhs.into())
            }
        }

        impl<R: Into<Expr>> ops::BitXor<R> for $lhs {
            type Output = Expr;
            fn bitxor(self, rhs: R) -> Expr {
                Expr::bin(BinOp::Xor, self.into(), rhs.into())
            }
        }

        impl ops::Not for $lhs {
            type Output = Expr;
            fn not(self) -> Expr {
                Expr::Not(Box::new(self.into()))
            }
        }

        impl ops::Shl<u32> for $lhs {
            type Output = Expr;
            fn shl(self, n: u32) -> Expr {
                Expr::Shl(Box::new(self.into()), n)
            }
        }

        impl ops::Shr<u32> for $lhs {
            type Output = Expr;
            fn shr(self, n: u32) -> Expr {
                Expr::Shr(Box::new(self.into()), n)
            }
        }
    };
}

impl_expr_ops!(Expr);
impl_expr_ops!(SignalId);
