//! Compilation of query expressions to straight-line index arithmetic.
//!
//! A compiled program reads array elements into registers and combines
//! them without materializing a single proxy. Translation is purely
//! static: it walks the schema alongside the expression, so any
//! construct whose lowering would need per-entry schema decisions
//! (union tags, nullable pointers) is reported as unsupported and the
//! caller evaluates through [`Expr::eval`] instead. For everything the
//! translator accepts, running the program is observably equivalent to
//! the proxy path.

use std::sync::Arc;

use espalier_core::{ArrayId, ArrayStore, PrimitiveType, Scalar, SchemaError, SchemaNode};

use crate::dataset::Dataset;
use crate::error::{AccessError, EvalError, TranslateError};
use crate::expr::{BinaryOp, Expr, UnaryOp};

/// A typed register handle. Numbering is per bank, so `Int(2)` and
/// `Float(2)` are different registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reg {
    Int(usize),
    Float(usize),
}

#[derive(Debug, Clone, Copy)]
enum Instr {
    IConst { dst: usize, value: i64 },
    FConst { dst: usize, value: f64 },
    /// Read `slots[slot]` at the index held in int register `index`
    /// and widen to `i64`.
    ReadInt { dst: usize, slot: usize, index: usize },
    /// Read `slots[slot]` at the index held in int register `index`
    /// and widen to `f64`.
    ReadFloat { dst: usize, slot: usize, index: usize },
    IAdd { dst: usize, a: usize, b: usize },
    ISub { dst: usize, a: usize, b: usize },
    IMul { dst: usize, a: usize, b: usize },
    IToF { dst: usize, src: usize },
    FAdd { dst: usize, a: usize, b: usize },
    FSub { dst: usize, a: usize, b: usize },
    FMul { dst: usize, a: usize, b: usize },
    FDiv { dst: usize, a: usize, b: usize },
    FUnary { op: UnaryOp, dst: usize, src: usize },
    /// Trap unless `0 <= index < stop - start`, with the range bounds
    /// in int registers.
    CheckIndex { index: usize, start: usize, stop: usize },
}

/// A compiled expression: straight-line instructions over two register
/// banks, plus the arrays they read. Int register 0 is the entry index
/// input.
#[derive(Debug, Clone)]
pub struct Program {
    instrs: Vec<Instr>,
    slots: Vec<ArrayId>,
    n_int: usize,
    n_float: usize,
    result: Reg,
}

impl Program {
    /// Evaluate for the entry at `index`.
    ///
    /// # Errors
    ///
    /// The same classes the proxy path raises: bounds traps as
    /// [`AccessError`] values, store failures, and scalar widening
    /// failures.
    pub fn run(&self, store: &ArrayStore, index: usize) -> Result<Scalar, EvalError> {
        let mut ints = vec![0i64; self.n_int];
        let mut floats = vec![0f64; self.n_float];
        ints[0] = index as i64;

        for instr in &self.instrs {
            match *instr {
                Instr::IConst { dst, value } => ints[dst] = value,
                Instr::FConst { dst, value } => floats[dst] = value,
                Instr::ReadInt { dst, slot, index } => {
                    let at = usize::try_from(ints[index])
                        .map_err(|_| AccessError::NegativeIndex { index: ints[index] })?;
                    ints[dst] = store.read(&self.slots[slot], at)?.to_i64_exact()?;
                }
                Instr::ReadFloat { dst, slot, index } => {
                    let at = usize::try_from(ints[index])
                        .map_err(|_| AccessError::NegativeIndex { index: ints[index] })?;
                    floats[dst] = store.read(&self.slots[slot], at)?.to_f64_lossy()?;
                }
                Instr::IAdd { dst, a, b } => ints[dst] = ints[a].wrapping_add(ints[b]),
                Instr::ISub { dst, a, b } => ints[dst] = ints[a].wrapping_sub(ints[b]),
                Instr::IMul { dst, a, b } => ints[dst] = ints[a].wrapping_mul(ints[b]),
                Instr::IToF { dst, src } => floats[dst] = ints[src] as f64,
                Instr::FAdd { dst, a, b } => floats[dst] = floats[a] + floats[b],
                Instr::FSub { dst, a, b } => floats[dst] = floats[a] - floats[b],
                Instr::FMul { dst, a, b } => floats[dst] = floats[a] * floats[b],
                Instr::FDiv { dst, a, b } => floats[dst] = floats[a] / floats[b],
                Instr::FUnary { op, dst, src } => {
                    let value = floats[src];
                    floats[dst] = match op {
                        UnaryOp::Neg => -value,
                        UnaryOp::Sqrt => value.sqrt(),
                        UnaryOp::Abs => value.abs(),
                        UnaryOp::Sin => value.sin(),
                        UnaryOp::Cos => value.cos(),
                        UnaryOp::Sinh => value.sinh(),
                        UnaryOp::Cosh => value.cosh(),
                    };
                }
                Instr::CheckIndex { index, start, stop } => {
                    let value = ints[index];
                    if value < 0 {
                        return Err(EvalError::Access(AccessError::NegativeIndex {
                            index: value,
                        }));
                    }
                    let len = ints[stop].saturating_sub(ints[start]).max(0);
                    if value >= len {
                        return Err(EvalError::Access(AccessError::IndexOutOfBounds {
                            index: value as usize,
                            len: len as usize,
                        }));
                    }
                }
            }
        }

        Ok(match self.result {
            Reg::Int(reg) => Scalar::I64(ints[reg]),
            Reg::Float(reg) => Scalar::F64(floats[reg]),
        })
    }
}

/// A program bound to the store it was compiled against.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    program: Program,
    store: ArrayStore,
}

impl CompiledQuery {
    pub fn eval(&self, index: usize) -> Result<Scalar, EvalError> {
        self.program.run(&self.store, index)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }
}

/// Proxy-path evaluation of an expression the translator declined.
#[derive(Debug, Clone)]
pub struct FallbackQuery {
    expr: Expr,
    dataset: Dataset,
}

impl FallbackQuery {
    pub fn eval(&self, index: usize) -> Result<Scalar, EvalError> {
        self.expr.eval(&self.dataset, index)
    }
}

/// A query ready to evaluate, compiled when possible.
#[derive(Debug, Clone)]
pub enum Query {
    Compiled(CompiledQuery),
    Fallback(FallbackQuery),
}

impl Query {
    pub fn eval(&self, index: usize) -> Result<Scalar, EvalError> {
        match self {
            Query::Compiled(query) => query.eval(index),
            Query::Fallback(query) => query.eval(index),
        }
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self, Query::Compiled(_))
    }
}

impl Dataset {
    /// Compile `expr` against this dataset's schema.
    ///
    /// # Errors
    ///
    /// [`TranslateError::UnsupportedPattern`] for constructs the
    /// translator cannot lower; [`TranslateError::Schema`] when the
    /// expression misuses the schema and would fail however evaluated.
    pub fn compile(&self, expr: &Expr) -> Result<CompiledQuery, TranslateError> {
        let program = translate(&self.root, expr)?;
        Ok(CompiledQuery {
            program,
            store: self.store.clone(),
        })
    }

    /// Compile `expr`, falling back to proxy evaluation when the
    /// translator reports an unsupported pattern. Schema misuse still
    /// fails.
    pub fn query(&self, expr: &Expr) -> Result<Query, TranslateError> {
        match self.compile(expr) {
            Ok(compiled) => Ok(Query::Compiled(compiled)),
            Err(TranslateError::UnsupportedPattern { .. }) => Ok(Query::Fallback(FallbackQuery {
                expr: expr.clone(),
                dataset: self.clone(),
            })),
            Err(err) => Err(err),
        }
    }
}

fn translate(root: &Arc<SchemaNode>, expr: &Expr) -> Result<Program, TranslateError> {
    let mut translator = Translator {
        root,
        instrs: Vec::new(),
        slots: Vec::new(),
        n_int: 1,
        n_float: 0,
    };
    let result = translator.lower_value(expr)?;
    Ok(Program {
        instrs: translator.instrs,
        slots: translator.slots,
        n_int: translator.n_int,
        n_float: translator.n_float,
        result,
    })
}

/// A navigation result: a schema node plus the int register holding
/// the index into its domain.
#[derive(Clone, Copy)]
struct Place<'a> {
    node: &'a Arc<SchemaNode>,
    index: usize,
}

struct Translator<'a> {
    root: &'a Arc<SchemaNode>,
    instrs: Vec<Instr>,
    slots: Vec<ArrayId>,
    n_int: usize,
    n_float: usize,
}

impl<'a> Translator<'a> {
    fn emit(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    fn int_reg(&mut self) -> usize {
        let reg = self.n_int;
        self.n_int += 1;
        reg
    }

    fn float_reg(&mut self) -> usize {
        let reg = self.n_float;
        self.n_float += 1;
        reg
    }

    fn slot_for(&mut self, id: &ArrayId) -> usize {
        match self.slots.iter().position(|slot| slot == id) {
            Some(slot) => slot,
            None => {
                self.slots.push(id.clone());
                self.slots.len() - 1
            }
        }
    }

    fn read_int(&mut self, id: &ArrayId, index: usize) -> usize {
        let slot = self.slot_for(id);
        let dst = self.int_reg();
        self.emit(Instr::ReadInt { dst, slot, index });
        dst
    }

    /// Coerce to the float bank.
    fn to_float(&mut self, value: Reg) -> usize {
        match value {
            Reg::Float(reg) => reg,
            Reg::Int(src) => {
                let dst = self.float_reg();
                self.emit(Instr::IToF { dst, src });
                dst
            }
        }
    }

    /// Follow non-nullable pointers to their targets. Maskable pointers
    /// and unions cannot be peeled statically.
    fn deref(&mut self, mut place: Place<'a>) -> Result<Place<'a>, TranslateError> {
        loop {
            match &**place.node {
                SchemaNode::Pointer {
                    positions,
                    mask: None,
                    target,
                } => {
                    let slot = self.slot_for(positions);
                    let dst = self.int_reg();
                    self.emit(Instr::ReadInt {
                        dst,
                        slot,
                        index: place.index,
                    });
                    place = Place {
                        node: target,
                        index: dst,
                    };
                }
                SchemaNode::Pointer { mask: Some(_), .. } => {
                    return Err(TranslateError::UnsupportedPattern {
                        detail: "nullable pointer traversal".to_owned(),
                    });
                }
                SchemaNode::Union { .. } => {
                    return Err(TranslateError::UnsupportedPattern {
                        detail: "union traversal".to_owned(),
                    });
                }
                _ => return Ok(place),
            }
        }
    }

    fn lower_entry(&mut self) -> Result<Place<'a>, TranslateError> {
        let root = self.root;
        let (starts, stops, item) = match &**root {
            SchemaNode::List {
                starts,
                stops,
                item,
            } => (starts, stops, item),
            other => {
                return Err(TranslateError::Schema(SchemaError::KindMismatch {
                    path: String::new(),
                    expected: "list",
                    found: other.kind_name(),
                }));
            }
        };
        let zero = self.int_reg();
        self.emit(Instr::IConst { dst: zero, value: 0 });
        let start = self.read_int(starts, zero);
        let stop = self.read_int(stops, zero);
        self.emit(Instr::CheckIndex {
            index: 0,
            start,
            stop,
        });
        let abs = self.int_reg();
        self.emit(Instr::IAdd {
            dst: abs,
            a: start,
            b: 0,
        });
        self.deref(Place {
            node: item,
            index: abs,
        })
    }

    fn lower_nav(&mut self, expr: &Expr) -> Result<Place<'a>, TranslateError> {
        match expr {
            Expr::Entry => self.lower_entry(),
            Expr::Field(base, name) => {
                let place = self.lower_nav(base)?;
                let fields = match &**place.node {
                    SchemaNode::Record { fields } => fields,
                    other => {
                        return Err(TranslateError::Schema(SchemaError::KindMismatch {
                            path: name.clone(),
                            expected: "record",
                            found: other.kind_name(),
                        }));
                    }
                };
                let field = fields
                    .iter()
                    .find(|f| f.name.as_ref() == name.as_str())
                    .ok_or_else(|| {
                        TranslateError::Schema(SchemaError::UnknownPath { path: name.clone() })
                    })?;
                self.deref(Place {
                    node: &field.node,
                    index: place.index,
                })
            }
            Expr::Index(base, index_expr) => {
                let place = self.lower_nav(base)?;
                let (starts, stops, item) = match &**place.node {
                    SchemaNode::List {
                        starts,
                        stops,
                        item,
                    } => (starts, stops, item),
                    other => {
                        return Err(TranslateError::Schema(SchemaError::KindMismatch {
                            path: String::new(),
                            expected: "list",
                            found: other.kind_name(),
                        }));
                    }
                };
                let start = self.read_int(starts, place.index);
                let stop = self.read_int(stops, place.index);
                let index_reg = match self.lower_value(index_expr)? {
                    Reg::Int(reg) => reg,
                    Reg::Float(_) => {
                        return Err(TranslateError::UnsupportedPattern {
                            detail: "non-integer index expression".to_owned(),
                        });
                    }
                };
                self.emit(Instr::CheckIndex {
                    index: index_reg,
                    start,
                    stop,
                });
                let abs = self.int_reg();
                self.emit(Instr::IAdd {
                    dst: abs,
                    a: start,
                    b: index_reg,
                });
                self.deref(Place {
                    node: item,
                    index: abs,
                })
            }
            Expr::Len(_)
            | Expr::LitI64(_)
            | Expr::LitF64(_)
            | Expr::Unary(..)
            | Expr::Binary(..) => Err(TranslateError::Schema(SchemaError::KindMismatch {
                path: String::new(),
                expected: "record or list",
                found: "computed value",
            })),
        }
    }

    fn lower_value(&mut self, expr: &Expr) -> Result<Reg, TranslateError> {
        match expr {
            Expr::Entry | Expr::Field(..) | Expr::Index(..) => {
                let place = self.lower_nav(expr)?;
                let (dtype, data) = match &**place.node {
                    SchemaNode::Primitive { dtype, data } => (*dtype, data),
                    other => {
                        return Err(TranslateError::Schema(SchemaError::KindMismatch {
                            path: String::new(),
                            expected: "primitive",
                            found: other.kind_name(),
                        }));
                    }
                };
                if dtype == PrimitiveType::Bool {
                    return Err(TranslateError::UnsupportedPattern {
                        detail: "bool-typed leaf".to_owned(),
                    });
                }
                let slot = self.slot_for(data);
                if dtype.is_float() {
                    let dst = self.float_reg();
                    self.emit(Instr::ReadFloat {
                        dst,
                        slot,
                        index: place.index,
                    });
                    Ok(Reg::Float(dst))
                } else {
                    let dst = self.int_reg();
                    self.emit(Instr::ReadInt {
                        dst,
                        slot,
                        index: place.index,
                    });
                    Ok(Reg::Int(dst))
                }
            }
            Expr::Len(base) => {
                let place = self.lower_nav(base)?;
                let (starts, stops) = match &**place.node {
                    SchemaNode::List { starts, stops, .. } => (starts, stops),
                    other => {
                        return Err(TranslateError::Schema(SchemaError::KindMismatch {
                            path: String::new(),
                            expected: "list",
                            found: other.kind_name(),
                        }));
                    }
                };
                let start = self.read_int(starts, place.index);
                let stop = self.read_int(stops, place.index);
                let dst = self.int_reg();
                self.emit(Instr::ISub {
                    dst,
                    a: stop,
                    b: start,
                });
                Ok(Reg::Int(dst))
            }
            Expr::LitI64(value) => {
                let dst = self.int_reg();
                self.emit(Instr::IConst { dst, value: *value });
                Ok(Reg::Int(dst))
            }
            Expr::LitF64(value) => {
                let dst = self.float_reg();
                self.emit(Instr::FConst { dst, value: *value });
                Ok(Reg::Float(dst))
            }
            Expr::Unary(op, base) => {
                let value = self.lower_value(base)?;
                match (op, value) {
                    (UnaryOp::Neg, Reg::Int(src)) => {
                        let zero = self.int_reg();
                        self.emit(Instr::IConst { dst: zero, value: 0 });
                        let dst = self.int_reg();
                        self.emit(Instr::ISub {
                            dst,
                            a: zero,
                            b: src,
                        });
                        Ok(Reg::Int(dst))
                    }
                    (op, value) => {
                        let src = self.to_float(value);
                        let dst = self.float_reg();
                        self.emit(Instr::FUnary { op: *op, dst, src });
                        Ok(Reg::Float(dst))
                    }
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs_value = self.lower_value(lhs)?;
                let rhs_value = self.lower_value(rhs)?;
                let float = matches!(op, BinaryOp::Div)
                    || matches!(lhs_value, Reg::Float(_))
                    || matches!(rhs_value, Reg::Float(_));
                if float {
                    let a = self.to_float(lhs_value);
                    let b = self.to_float(rhs_value);
                    let dst = self.float_reg();
                    self.emit(match op {
                        BinaryOp::Add => Instr::FAdd { dst, a, b },
                        BinaryOp::Sub => Instr::FSub { dst, a, b },
                        BinaryOp::Mul => Instr::FMul { dst, a, b },
                        BinaryOp::Div => Instr::FDiv { dst, a, b },
                    });
                    Ok(Reg::Float(dst))
                } else {
                    let (a, b) = match (lhs_value, rhs_value) {
                        (Reg::Int(a), Reg::Int(b)) => (a, b),
                        _ => unreachable!("non-float operands are integer registers"),
                    };
                    let dst = self.int_reg();
                    self.emit(match op {
                        BinaryOp::Add => Instr::IAdd { dst, a, b },
                        BinaryOp::Sub => Instr::ISub { dst, a, b },
                        BinaryOp::Mul => Instr::IMul { dst, a, b },
                        BinaryOp::Div => unreachable!("division always lowers to the float bank"),
                    });
                    Ok(Reg::Int(dst))
                }
            }
        }
    }
}
