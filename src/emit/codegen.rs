use crate::{
    compilation::{
        bound::*,
        unit::{CompilationUnit, UnitKind},
    },
    emit::{
        error::EmitError,
        image::{Constant, FunctionProto, Image, ImageKind, LineEntry, Op},
    },
    language::ast::{BinaryOp, UnaryOp},
};

const INDEX_LIMIT: usize = u16::MAX as usize + 1;
const ARGUMENT_LIMIT: usize = u8::MAX as usize;

/// Lowers a bound unit to its image.
pub fn generate(unit: &CompilationUnit) -> Result<Image, EmitError> {
    let program = unit.program();
    check_entries("functions", program.functions.len())?;
    check_entries("imports", program.imports.len())?;
    check_entries("session variables", program.slot_names.len())?;

    let mut functions = Vec::with_capacity(program.functions.len());
    for (index, function) in program.functions.iter().enumerate() {
        let prologue = (program.entry == Some(index)).then_some(program.function_slots.as_slice());
        functions.push(FunctionEmitter::new(function, program.record).emit(prologue)?);
    }

    Ok(Image {
        kind: match unit.kind() {
            UnitKind::Script { .. } => ImageKind::Submission,
            UnitKind::Library { .. } => ImageKind::Library,
        },
        name: unit.name().to_string(),
        ordinal: unit.ordinal().unwrap_or(0),
        slot_names: program.slot_names.clone(),
        imports: program.imports.clone(),
        functions,
        entry: unit.entry_point_name(),
    })
}

fn check_entries(what: &'static str, count: usize) -> Result<(), EmitError> {
    if count > INDEX_LIMIT {
        return Err(EmitError::TooManyEntries {
            what,
            count,
            limit: INDEX_LIMIT,
        });
    }
    Ok(())
}

struct LoopLabels {
    start: usize,
    breaks: Vec<usize>,
}

struct FunctionEmitter<'a> {
    function: &'a BoundFunction,
    record: Option<usize>,
    code: Vec<Op>,
    constants: Vec<Constant>,
    lines: Vec<LineEntry>,
    loops: Vec<LoopLabels>,
    line: Option<u32>,
}

impl<'a> FunctionEmitter<'a> {
    fn new(function: &'a BoundFunction, record: Option<usize>) -> Self {
        Self {
            function,
            record,
            code: Vec::new(),
            constants: Vec::new(),
            lines: Vec::new(),
            loops: Vec::new(),
            line: None,
        }
    }

    /// `prologue` is set for the entry routine: it creates the submission
    /// record and publishes the unit's functions into it.
    fn emit(mut self, prologue: Option<&[FunctionSlot]>) -> Result<FunctionProto, EmitError> {
        let function = self.function;
        let arity = u8::try_from(function.arity).map_err(|_| EmitError::TooManyParameters {
            function: function.name.clone(),
            count: function.arity,
            limit: ARGUMENT_LIMIT,
        })?;
        let locals = u16::try_from(function.locals).map_err(|_| EmitError::TooManyLocals {
            function: function.name.clone(),
            limit: u16::MAX as usize,
        })?;

        self.set_line(function.line)?;
        if let (Some(prologue), Some(record)) = (prologue, self.record) {
            self.push(Op::InitSubmission);
            for slot in prologue {
                let op = Op::LoadFunction(self.narrow(slot.function)?);
                self.push(op);
                let op = self.slot_op(record, slot.slot, true)?;
                self.push(op);
            }
        }

        self.block(&function.body)?;
        self.push(Op::Return);

        Ok(FunctionProto {
            name: function.name.clone(),
            arity,
            locals,
            constants: self.constants,
            code: self.code,
            lines: self.lines,
        })
    }

    fn block(&mut self, block: &BoundBlock) -> Result<(), EmitError> {
        for statement in &block.statements {
            self.statement(statement)?;
        }
        match &block.tail {
            Some((line, expr)) => {
                self.set_line(*line)?;
                self.expr(expr)
            }
            None => {
                self.push(Op::Unit);
                Ok(())
            }
        }
    }

    fn statement(&mut self, statement: &BoundStmt) -> Result<(), EmitError> {
        match statement {
            BoundStmt::Store { place, value, line } => {
                self.set_line(*line)?;
                self.expr(value)?;
                self.store(*place)
            }
            BoundStmt::SetIndex {
                base,
                index,
                value,
                line,
            } => {
                self.set_line(*line)?;
                self.expr(base)?;
                self.expr(index)?;
                self.expr(value)?;
                self.push(Op::SetIndex);
                Ok(())
            }
            BoundStmt::Expr { expr, line } => {
                self.set_line(*line)?;
                self.expr(expr)?;
                self.push(Op::Pop);
                Ok(())
            }
            BoundStmt::Return { value, line } => {
                self.set_line(*line)?;
                match value {
                    Some(value) => self.expr(value)?,
                    None => self.push(Op::Unit),
                }
                self.push(Op::Return);
                Ok(())
            }
            BoundStmt::While {
                condition,
                body,
                line,
            } => {
                self.set_line(*line)?;
                let start = self.code.len();
                self.expr(condition)?;
                let exit = self.push_jump(Op::JumpIfFalse(0));
                self.loops.push(LoopLabels {
                    start,
                    breaks: Vec::new(),
                });
                self.block(body)?;
                self.push(Op::Pop);
                let target = self.target(start)?;
                self.push(Op::Jump(target));
                let end = self.code.len();
                self.patch(exit, end)?;
                if let Some(labels) = self.loops.pop() {
                    for jump in labels.breaks {
                        self.patch(jump, end)?;
                    }
                }
                Ok(())
            }
            BoundStmt::Break { line } => {
                self.set_line(*line)?;
                let jump = self.push_jump(Op::Jump(0));
                match self.loops.last_mut() {
                    Some(labels) => {
                        labels.breaks.push(jump);
                        Ok(())
                    }
                    None => Err(self.loop_control("break")),
                }
            }
            BoundStmt::Continue { line } => {
                self.set_line(*line)?;
                let start = match self.loops.last() {
                    Some(labels) => labels.start,
                    None => return Err(self.loop_control("continue")),
                };
                let target = self.target(start)?;
                self.push(Op::Jump(target));
                Ok(())
            }
        }
    }

    fn expr(&mut self, expr: &BoundExpr) -> Result<(), EmitError> {
        match expr {
            BoundExpr::Unit => self.push(Op::Unit),
            BoundExpr::Bool(true) => self.push(Op::True),
            BoundExpr::Bool(false) => self.push(Op::False),
            BoundExpr::Int(value) => self.constant(Constant::Int(*value))?,
            BoundExpr::Float(value) => self.constant(Constant::Float(*value))?,
            BoundExpr::Str(value) => self.constant(Constant::Str(value.clone()))?,
            BoundExpr::Load(place) => self.load(*place)?,
            BoundExpr::Function(index) => {
                let op = Op::LoadFunction(self.narrow(*index)?);
                self.push(op);
            }
            BoundExpr::Import(index) => {
                let op = Op::LoadImport(self.narrow(*index)?);
                self.push(op);
            }
            BoundExpr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                self.expr(left)?;
                let left_false = self.push_jump(Op::JumpIfFalse(0));
                self.expr(right)?;
                let right_false = self.push_jump(Op::JumpIfFalse(0));
                self.push(Op::True);
                let done = self.push_jump(Op::Jump(0));
                let falsy = self.code.len();
                self.patch(left_false, falsy)?;
                self.patch(right_false, falsy)?;
                self.push(Op::False);
                let end = self.code.len();
                self.patch(done, end)?;
            }
            BoundExpr::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                self.expr(left)?;
                let try_right = self.push_jump(Op::JumpIfFalse(0));
                self.push(Op::True);
                let left_true = self.push_jump(Op::Jump(0));
                let right_start = self.code.len();
                self.patch(try_right, right_start)?;
                self.expr(right)?;
                let right_false = self.push_jump(Op::JumpIfFalse(0));
                self.push(Op::True);
                let right_true = self.push_jump(Op::Jump(0));
                let falsy = self.code.len();
                self.patch(right_false, falsy)?;
                self.push(Op::False);
                let end = self.code.len();
                self.patch(left_true, end)?;
                self.patch(right_true, end)?;
            }
            BoundExpr::Binary { op, left, right } => {
                self.expr(left)?;
                self.expr(right)?;
                self.push(match op {
                    BinaryOp::Add => Op::Add,
                    BinaryOp::Sub => Op::Sub,
                    BinaryOp::Mul => Op::Mul,
                    BinaryOp::Div => Op::Div,
                    BinaryOp::Rem => Op::Rem,
                    BinaryOp::Eq => Op::Eq,
                    BinaryOp::NotEq => Op::Ne,
                    BinaryOp::Lt => Op::Lt,
                    BinaryOp::LtEq => Op::Le,
                    BinaryOp::Gt => Op::Gt,
                    BinaryOp::GtEq => Op::Ge,
                    BinaryOp::And | BinaryOp::Or => unreachable!("lowered above"),
                });
            }
            BoundExpr::Unary { op, expr } => {
                self.expr(expr)?;
                self.push(match op {
                    UnaryOp::Neg => Op::Neg,
                    UnaryOp::Not => Op::Not,
                });
            }
            BoundExpr::Call { callee, args } => {
                let argc = self.argument_count(args.len())?;
                self.expr(callee)?;
                for arg in args {
                    self.expr(arg)?;
                }
                self.push(Op::Call(argc));
            }
            BoundExpr::Intrinsic { intrinsic, args } => {
                let argc = self.argument_count(args.len())?;
                for arg in args {
                    self.expr(arg)?;
                }
                self.push(Op::Intrinsic {
                    id: intrinsic.id(),
                    argc,
                });
            }
            BoundExpr::Index { base, index } => {
                self.expr(base)?;
                self.expr(index)?;
                self.push(Op::Index);
            }
            BoundExpr::List(items) => {
                let count = u16::try_from(items.len()).map_err(|_| EmitError::TooManyElements {
                    function: self.function.name.clone(),
                    count: items.len(),
                    limit: u16::MAX as usize,
                })?;
                for item in items {
                    self.expr(item)?;
                }
                self.push(Op::MakeList(count));
            }
            BoundExpr::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expr(condition)?;
                let to_else = self.push_jump(Op::JumpIfFalse(0));
                self.block(then_branch)?;
                let to_end = self.push_jump(Op::Jump(0));
                let else_start = self.code.len();
                self.patch(to_else, else_start)?;
                match else_branch {
                    Some(block) => self.block(block)?,
                    None => self.push(Op::Unit),
                }
                let end = self.code.len();
                self.patch(to_end, end)?;
            }
            BoundExpr::Block(block) => self.block(block)?,
        }
        Ok(())
    }

    fn load(&mut self, place: Place) -> Result<(), EmitError> {
        let op = match place {
            Place::Local(index) => Op::LoadLocal(self.local(index)?),
            Place::Slot { record, index } => self.slot_op(record, index, false)?,
        };
        self.push(op);
        Ok(())
    }

    fn store(&mut self, place: Place) -> Result<(), EmitError> {
        let op = match place {
            Place::Local(index) => Op::StoreLocal(self.local(index)?),
            Place::Slot { record, index } => self.slot_op(record, index, true)?,
        };
        self.push(op);
        Ok(())
    }

    fn slot_op(&self, record: usize, index: usize, store: bool) -> Result<Op, EmitError> {
        let record = u32::try_from(record).map_err(|_| EmitError::TooManyEntries {
            what: "submissions",
            count: record,
            limit: u32::MAX as usize,
        })?;
        let index = self.narrow(index)?;
        Ok(if store {
            Op::StoreSlot { record, index }
        } else {
            Op::LoadSlot { record, index }
        })
    }

    fn local(&self, index: usize) -> Result<u16, EmitError> {
        u16::try_from(index).map_err(|_| EmitError::TooManyLocals {
            function: self.function.name.clone(),
            limit: u16::MAX as usize,
        })
    }

    fn narrow(&self, index: usize) -> Result<u16, EmitError> {
        u16::try_from(index).map_err(|_| EmitError::TooManyEntries {
            what: "indexed entries",
            count: index + 1,
            limit: INDEX_LIMIT,
        })
    }

    fn argument_count(&self, count: usize) -> Result<u8, EmitError> {
        u8::try_from(count).map_err(|_| EmitError::TooManyArguments {
            function: self.function.name.clone(),
            count,
            limit: ARGUMENT_LIMIT,
        })
    }

    fn constant(&mut self, constant: Constant) -> Result<(), EmitError> {
        let index = match self.constants.iter().position(|existing| *existing == constant) {
            Some(index) => index,
            None => {
                self.constants.push(constant);
                self.constants.len() - 1
            }
        };
        let index = u16::try_from(index).map_err(|_| EmitError::TooManyConstants {
            function: self.function.name.clone(),
            limit: INDEX_LIMIT,
        })?;
        self.push(Op::Const(index));
        Ok(())
    }

    fn push(&mut self, op: Op) {
        self.code.push(op);
    }

    fn push_jump(&mut self, op: Op) -> usize {
        self.code.push(op);
        self.code.len() - 1
    }

    fn target(&self, pc: usize) -> Result<u32, EmitError> {
        u32::try_from(pc).map_err(|_| EmitError::CodeTooLarge {
            function: self.function.name.clone(),
        })
    }

    fn patch(&mut self, jump: usize, destination: usize) -> Result<(), EmitError> {
        let target = self.target(destination)?;
        match &mut self.code[jump] {
            Op::Jump(slot) | Op::JumpIfFalse(slot) => *slot = target,
            _ => {}
        }
        Ok(())
    }

    fn set_line(&mut self, line: u32) -> Result<(), EmitError> {
        if self.line == Some(line) {
            return Ok(());
        }
        let op = self.target(self.code.len())?;
        match self.lines.last_mut() {
            Some(entry) if entry.op == op => entry.line = line,
            _ => self.lines.push(LineEntry { op, line }),
        }
        self.line = Some(line);
        Ok(())
    }

    fn loop_control(&self, keyword: &'static str) -> EmitError {
        EmitError::LoopControl {
            function: self.function.name.clone(),
            keyword,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::ReferenceSet;
    use std::sync::Arc;

    fn script(source: &str) -> CompilationUnit {
        CompilationUnit::create(
            UnitKind::Script { ordinal: 1 },
            source,
            ReferenceSet::empty(),
            Arc::from(Vec::new()),
            None,
        )
        .expect("parse")
    }

    #[test]
    fn entry_initialises_record_and_stores_functions() {
        let image = generate(&script("fn one() { 1 } let x = one();")).expect("emit");
        assert_eq!(image.kind, ImageKind::Submission);
        assert_eq!(image.entry.as_deref(), Some("Submission#1.<Main>"));
        let (_, entry) = image.function("Submission#1.<Main>").expect("entry");
        assert_eq!(
            &entry.code[..3],
            &[
                Op::InitSubmission,
                Op::LoadFunction(0),
                Op::StoreSlot {
                    record: 0,
                    index: 0
                },
            ]
        );
        assert_eq!(entry.code.last(), Some(&Op::Return));
    }

    #[test]
    fn while_loops_patch_break_and_exit() {
        let image = generate(&script(
            "let mut i = 0; while true { if i > 2 { break; } i = i + 1; } i",
        ))
        .expect("emit");
        let (_, entry) = image.function("Submission#1.<Main>").expect("entry");
        let len = entry.code.len() as u32;
        for op in &entry.code {
            if let Op::Jump(target) | Op::JumpIfFalse(target) = op {
                assert!(*target < len, "jump past end: {op:?}");
                assert_ne!(*target, 0, "unpatched jump: {op:?}");
            }
        }
    }

    #[test]
    fn oversized_call_is_an_emit_error() {
        let args = vec!["0"; 256].join(",");
        let err = generate(&script(&format!("print({args})"))).unwrap_err();
        assert!(matches!(err, EmitError::TooManyArguments { count: 256, .. }));
    }

    #[test]
    fn constants_are_pooled() {
        let image = generate(&script("let a = 7; let b = 7; a + b")).expect("emit");
        let (_, entry) = image.function("Submission#1.<Main>").expect("entry");
        assert_eq!(entry.constants, vec![Constant::Int(7)]);
    }
}
