//! In-memory form of the binary image format.
//!
//! Layout (little endian, strings are `u32` length + UTF-8):
//!
//! ```text
//! magic "PRIM" | version u16 | kind u8 | name | ordinal u32
//! slot names   : u32 count, string*
//! imports      : u32 count, (namespace, name)*
//! functions    : u32 count, function*
//! entry        : u8 flag, [name]
//!
//! function     : name | arity u8 | locals u16
//!                constants : u32 count, (tag u8, payload)*
//!                code      : u32 count, (opcode u8, operands)*
//!                lines     : u32 count, (op u32, line u32)*
//! ```

pub use crate::compilation::bound::ImportRef;

pub const MAGIC: &[u8; 4] = b"PRIM";
pub const FORMAT_VERSION: u16 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageKind {
    Submission,
    Library,
}

impl ImageKind {
    pub fn tag(self) -> u8 {
        match self {
            ImageKind::Submission => 0,
            ImageKind::Library => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ImageKind::Submission),
            1 => Some(ImageKind::Library),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub kind: ImageKind,
    pub name: String,
    /// Submission ordinal, 0 for libraries.
    pub ordinal: u32,
    pub slot_names: Vec<String>,
    pub imports: Vec<ImportRef>,
    pub functions: Vec<FunctionProto>,
    pub entry: Option<String>,
}

impl Image {
    pub fn function(&self, name: &str) -> Option<(usize, &FunctionProto)> {
        self.functions
            .iter()
            .enumerate()
            .find(|(_, function)| function.name == name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionProto {
    pub name: String,
    pub arity: u8,
    pub locals: u16,
    pub constants: Vec<Constant>,
    pub code: Vec<Op>,
    pub lines: Vec<LineEntry>,
}

impl FunctionProto {
    /// Source line of the instruction at `pc`.
    pub fn line_at(&self, pc: usize) -> u32 {
        self.lines
            .iter()
            .take_while(|entry| entry.op as usize <= pc)
            .last()
            .map(|entry| entry.line)
            .unwrap_or(0)
    }

    /// Unqualified name, as a user wrote it.
    pub fn short_name(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map(|(_, name)| name)
            .unwrap_or(&self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineEntry {
    pub op: u32,
    pub line: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Constant {
    pub const TAG_INT: u8 = 0;
    pub const TAG_FLOAT: u8 = 1;
    pub const TAG_STR: u8 = 2;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Const(u16),
    Unit,
    True,
    False,
    LoadLocal(u16),
    StoreLocal(u16),
    LoadSlot { record: u32, index: u16 },
    StoreSlot { record: u32, index: u16 },
    LoadImport(u16),
    LoadFunction(u16),
    /// Creates this submission's record in the submission state.
    InitSubmission,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Absolute instruction index.
    Jump(u32),
    /// Pops the condition.
    JumpIfFalse(u32),
    Pop,
    Call(u8),
    Intrinsic { id: u8, argc: u8 },
    MakeList(u16),
    Index,
    SetIndex,
    Return,
}

impl Op {
    pub fn opcode(&self) -> u8 {
        match self {
            Op::Const(_) => 0x00,
            Op::Unit => 0x01,
            Op::True => 0x02,
            Op::False => 0x03,
            Op::LoadLocal(_) => 0x04,
            Op::StoreLocal(_) => 0x05,
            Op::LoadSlot { .. } => 0x06,
            Op::StoreSlot { .. } => 0x07,
            Op::LoadImport(_) => 0x08,
            Op::LoadFunction(_) => 0x09,
            Op::InitSubmission => 0x0A,
            Op::Add => 0x10,
            Op::Sub => 0x11,
            Op::Mul => 0x12,
            Op::Div => 0x13,
            Op::Rem => 0x14,
            Op::Neg => 0x15,
            Op::Not => 0x16,
            Op::Eq => 0x17,
            Op::Ne => 0x18,
            Op::Lt => 0x19,
            Op::Le => 0x1A,
            Op::Gt => 0x1B,
            Op::Ge => 0x1C,
            Op::Jump(_) => 0x20,
            Op::JumpIfFalse(_) => 0x21,
            Op::Pop => 0x22,
            Op::Call(_) => 0x23,
            Op::Intrinsic { .. } => 0x24,
            Op::MakeList(_) => 0x25,
            Op::Index => 0x26,
            Op::SetIndex => 0x27,
            Op::Return => 0x28,
        }
    }
}
