//! Query expressions over dataset entries.
//!
//! Expressions describe an access chain from the current entry plus
//! arithmetic on the scalars it reaches. Arithmetic runs in a two-type
//! domain: integer reads widen to `i64`, float reads to `f64`, and any
//! division or float operand promotes the whole operation to `f64`.
//! Integer addition, subtraction, multiplication and negation wrap.

use espalier_core::{Scalar, ScalarTypeError};

use crate::dataset::Dataset;
use crate::error::EvalError;
use crate::proxy::Instance;

/// One node of a query expression tree.
///
/// Built with [`entry`] and the combinator methods; rarely spelled out
/// directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The entry currently under evaluation.
    Entry,
    /// A named field of a record value.
    Field(Box<Expr>, String),
    /// An element of a list value. Negative indices are an error, not
    /// wraparound.
    Index(Box<Expr>, Box<Expr>),
    /// The length of a list value, as `i64`.
    Len(Box<Expr>),
    LitI64(i64),
    LitF64(f64),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Negation. The only unary that keeps integers integral.
    Neg,
    Sqrt,
    Abs,
    Sin,
    Cos,
    Sinh,
    Cosh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Always evaluates in `f64`, even for two integer operands.
    Div,
}

/// The root of every query expression: the entry under evaluation.
pub fn entry() -> Expr {
    Expr::Entry
}

impl Expr {
    pub fn field(self, name: impl Into<String>) -> Expr {
        Expr::Field(Box::new(self), name.into())
    }

    pub fn index(self, index: impl Into<Expr>) -> Expr {
        Expr::Index(Box::new(self), Box::new(index.into()))
    }

    pub fn len(self) -> Expr {
        Expr::Len(Box::new(self))
    }

    pub fn sqrt(self) -> Expr {
        Expr::Unary(UnaryOp::Sqrt, Box::new(self))
    }

    pub fn abs(self) -> Expr {
        Expr::Unary(UnaryOp::Abs, Box::new(self))
    }

    pub fn sin(self) -> Expr {
        Expr::Unary(UnaryOp::Sin, Box::new(self))
    }

    pub fn cos(self) -> Expr {
        Expr::Unary(UnaryOp::Cos, Box::new(self))
    }

    pub fn sinh(self) -> Expr {
        Expr::Unary(UnaryOp::Sinh, Box::new(self))
    }

    pub fn cosh(self) -> Expr {
        Expr::Unary(UnaryOp::Cosh, Box::new(self))
    }

    /// Evaluate against entry `index` of `dataset` by materializing
    /// proxies step by step. This is the reference semantics that
    /// compiled programs must reproduce.
    ///
    /// # Errors
    ///
    /// Access and store failures pass through; kind and type misuse
    /// surfaces as [`EvalError::Type`] or
    /// [`EvalError::NonIntegerIndex`].
    pub fn eval(&self, dataset: &Dataset, index: usize) -> Result<Scalar, EvalError> {
        let instance = eval_instance(self, dataset, index)?;
        let value = instance.try_scalar()?;
        if value.dtype().is_integer() {
            Ok(Scalar::I64(value.to_i64_exact()?))
        } else if value.dtype().is_float() {
            Ok(Scalar::F64(value.to_f64_lossy()?))
        } else {
            Ok(value)
        }
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Expr {
        Expr::LitI64(value)
    }
}

/// Unsuffixed integer literals land here and widen to [`Expr::LitI64`].
impl From<i32> for Expr {
    fn from(value: i32) -> Expr {
        Expr::LitI64(i64::from(value))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Expr {
        Expr::LitF64(value)
    }
}

macro_rules! expr_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<R: Into<Expr>> std::ops::$trait<R> for Expr {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                Expr::Binary($op, Box::new(self), Box::new(rhs.into()))
            }
        }

        impl std::ops::$trait<Expr> for i64 {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                std::ops::$trait::$method(Expr::from(self), rhs)
            }
        }

        impl std::ops::$trait<Expr> for f64 {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                std::ops::$trait::$method(Expr::from(self), rhs)
            }
        }
    };
}

expr_binary_op!(Add, add, BinaryOp::Add);
expr_binary_op!(Sub, sub, BinaryOp::Sub);
expr_binary_op!(Mul, mul, BinaryOp::Mul);
expr_binary_op!(Div, div, BinaryOp::Div);

impl std::ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unary(UnaryOp::Neg, Box::new(self))
    }
}

fn eval_instance(expr: &Expr, dataset: &Dataset, index: usize) -> Result<Instance, EvalError> {
    match expr {
        Expr::Entry => Ok(dataset.get(index)?),
        Expr::Field(base, name) => {
            let instance = eval_instance(base, dataset, index)?;
            match &instance {
                Instance::Record(record) => Ok(record.get(name)?),
                other => Err(EvalError::Type(ScalarTypeError::new(
                    "record",
                    other.kind_name(),
                ))),
            }
        }
        Expr::Index(base, index_expr) => {
            let instance = eval_instance(base, dataset, index)?;
            let list = match &instance {
                Instance::List(list) => list,
                other => {
                    return Err(EvalError::Type(ScalarTypeError::new(
                        "list",
                        other.kind_name(),
                    )));
                }
            };
            let value = eval_scalar(index_expr, dataset, index)?;
            if !value.dtype().is_integer() {
                return Err(EvalError::NonIntegerIndex {
                    found: value.dtype().type_name(),
                });
            }
            let position = value.to_i64_exact()?;
            Ok(list.get_signed(position)?)
        }
        Expr::Len(base) => {
            let instance = eval_instance(base, dataset, index)?;
            match &instance {
                Instance::List(list) => Ok(Instance::Scalar(Scalar::I64(list.len() as i64))),
                other => Err(EvalError::Type(ScalarTypeError::new(
                    "list",
                    other.kind_name(),
                ))),
            }
        }
        Expr::LitI64(value) => Ok(Instance::Scalar(Scalar::I64(*value))),
        Expr::LitF64(value) => Ok(Instance::Scalar(Scalar::F64(*value))),
        Expr::Unary(op, base) => {
            let value = eval_scalar(base, dataset, index)?;
            let result = match op {
                UnaryOp::Neg => {
                    if value.dtype().is_integer() {
                        Scalar::I64(value.to_i64_exact()?.wrapping_neg())
                    } else {
                        Scalar::F64(-value.to_f64_lossy()?)
                    }
                }
                UnaryOp::Sqrt => Scalar::F64(value.to_f64_lossy()?.sqrt()),
                UnaryOp::Abs => Scalar::F64(value.to_f64_lossy()?.abs()),
                UnaryOp::Sin => Scalar::F64(value.to_f64_lossy()?.sin()),
                UnaryOp::Cos => Scalar::F64(value.to_f64_lossy()?.cos()),
                UnaryOp::Sinh => Scalar::F64(value.to_f64_lossy()?.sinh()),
                UnaryOp::Cosh => Scalar::F64(value.to_f64_lossy()?.cosh()),
            };
            Ok(Instance::Scalar(result))
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs_value = eval_scalar(lhs, dataset, index)?;
            let rhs_value = eval_scalar(rhs, dataset, index)?;
            let float = matches!(op, BinaryOp::Div)
                || lhs_value.dtype().is_float()
                || rhs_value.dtype().is_float();
            let result = if float {
                let a = lhs_value.to_f64_lossy()?;
                let b = rhs_value.to_f64_lossy()?;
                Scalar::F64(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                })
            } else {
                let a = lhs_value.to_i64_exact()?;
                let b = rhs_value.to_i64_exact()?;
                Scalar::I64(match op {
                    BinaryOp::Add => a.wrapping_add(b),
                    BinaryOp::Sub => a.wrapping_sub(b),
                    BinaryOp::Mul => a.wrapping_mul(b),
                    BinaryOp::Div => unreachable!("division always evaluates in floating point"),
                })
            };
            Ok(Instance::Scalar(result))
        }
    }
}

fn eval_scalar(expr: &Expr, dataset: &Dataset, index: usize) -> Result<Scalar, EvalError> {
    let instance = eval_instance(expr, dataset, index)?;
    instance.try_scalar().map_err(EvalError::Type)
}
