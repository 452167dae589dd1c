//! Resolved program tree handed from the binder to code generation. Every
//! name has been turned into a storage location, a function reference, an
//! import or an intrinsic.

use crate::{
    language::ast::{BinaryOp, UnaryOp},
    runtime::intrinsics::Intrinsic,
};

/// Where a variable lives at run time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Place {
    /// Frame-local slot of the executing function.
    Local(usize),
    /// Field `index` of the record owned by submission `record` (0-based).
    Slot { record: usize, index: usize },
}

#[derive(Clone, Debug)]
pub enum BoundExpr {
    Unit,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Load(Place),
    Function(usize),
    Import(usize),
    Binary {
        op: BinaryOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<BoundExpr>,
    },
    Call {
        callee: Box<BoundExpr>,
        args: Vec<BoundExpr>,
    },
    Intrinsic {
        intrinsic: Intrinsic,
        args: Vec<BoundExpr>,
    },
    Index {
        base: Box<BoundExpr>,
        index: Box<BoundExpr>,
    },
    List(Vec<BoundExpr>),
    If {
        condition: Box<BoundExpr>,
        then_branch: BoundBlock,
        else_branch: Option<BoundBlock>,
    },
    Block(BoundBlock),
}

#[derive(Clone, Debug, Default)]
pub struct BoundBlock {
    pub statements: Vec<BoundStmt>,
    pub tail: Option<(u32, Box<BoundExpr>)>,
}

#[derive(Clone, Debug)]
pub enum BoundStmt {
    Store {
        place: Place,
        value: BoundExpr,
        line: u32,
    },
    SetIndex {
        base: BoundExpr,
        index: BoundExpr,
        value: BoundExpr,
        line: u32,
    },
    Expr {
        expr: BoundExpr,
        line: u32,
    },
    Return {
        value: Option<BoundExpr>,
        line: u32,
    },
    While {
        condition: BoundExpr,
        body: BoundBlock,
        line: u32,
    },
    Break {
        line: u32,
    },
    Continue {
        line: u32,
    },
}

#[derive(Clone, Debug)]
pub struct BoundFunction {
    /// Fully qualified, e.g. `Submission#2.square` or `math.abs`.
    pub name: String,
    pub arity: usize,
    /// Parameters occupy the first `arity` locals.
    pub locals: usize,
    pub body: BoundBlock,
    pub line: u32,
}

/// An import table entry: an export of a referenced library.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImportRef {
    pub namespace: String,
    pub name: String,
}

/// Functions a submission stores into its own record before running.
#[derive(Clone, Copy, Debug)]
pub struct FunctionSlot {
    pub function: usize,
    pub slot: usize,
}

#[derive(Clone, Debug)]
pub struct BoundProgram {
    pub functions: Vec<BoundFunction>,
    pub imports: Vec<ImportRef>,
    pub slot_names: Vec<String>,
    pub function_slots: Vec<FunctionSlot>,
    /// Index into `functions` of the synthesized entry routine.
    pub entry: Option<usize>,
    pub record: Option<usize>,
}
