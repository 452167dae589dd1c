use crate::{
    compilation::{
        bound::*,
        diagnostic::*,
        symbols::{SubmissionSymbols, SymbolKind},
        unit::{CompilationUnit, UnitKind},
    },
    language::{
        ast::*,
        span::{line_col, Span},
    },
    references::ReferenceSet,
    runtime::intrinsics::{Arity, Intrinsic},
};

pub const ENTRY_NAME: &str = "<Main>";

pub struct BindContext<'a> {
    pub source: &'a str,
    pub kind: &'a UnitKind,
    pub previous: Option<&'a CompilationUnit>,
    pub references: &'a ReferenceSet,
    pub implicit_imports: &'a [String],
}

pub struct BindOutput {
    pub symbols: SubmissionSymbols,
    pub program: BoundProgram,
    /// Sorted by source position.
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolves every name in `submission` against the unit's own declarations,
/// the chain of previous units, the implicit imports and the intrinsics.
pub fn bind(ctx: BindContext<'_>, submission: &Submission) -> BindOutput {
    let mut binder = Binder::new(ctx);
    binder.bind_submission(submission);
    binder.finish()
}

enum Resolution {
    Local(usize),
    Function { index: usize, arity: usize },
    Slot {
        record: usize,
        index: usize,
        kind: SymbolKind,
    },
    Import { import: ImportRef, arity: usize },
    Intrinsic(Intrinsic),
    Ambiguous(Vec<String>),
    Unknown,
}

struct Local {
    name: String,
    index: usize,
    mutable: bool,
    used: bool,
    span: Span,
}

#[derive(Default)]
struct Frame {
    scopes: Vec<Vec<Local>>,
    next_local: usize,
    /// Statements outside any block of the entry routine declare session
    /// variables rather than locals.
    entry: bool,
}

impl Frame {
    fn entry() -> Self {
        Self {
            entry: true,
            ..Self::default()
        }
    }

    fn function() -> Self {
        Self {
            scopes: vec![Vec::new()],
            ..Self::default()
        }
    }

    fn at_top_level(&self) -> bool {
        self.entry && self.scopes.is_empty()
    }
}

struct Binder<'a> {
    source: &'a str,
    kind: &'a UnitKind,
    previous: Option<&'a CompilationUnit>,
    references: &'a ReferenceSet,
    implicit_imports: &'a [String],
    record: Option<usize>,
    symbols: SubmissionSymbols,
    functions: Vec<Option<BoundFunction>>,
    function_slots: Vec<FunctionSlot>,
    imports: Vec<ImportRef>,
    diagnostics: Vec<Diagnostic>,
    frame: Frame,
    loop_depth: usize,
    entry: Option<usize>,
}

impl<'a> Binder<'a> {
    fn new(ctx: BindContext<'a>) -> Self {
        Self {
            source: ctx.source,
            kind: ctx.kind,
            previous: ctx.previous,
            references: ctx.references,
            implicit_imports: ctx.implicit_imports,
            record: ctx.kind.record_index(),
            symbols: SubmissionSymbols::new(),
            functions: Vec::new(),
            function_slots: Vec::new(),
            imports: Vec::new(),
            diagnostics: Vec::new(),
            frame: Frame::default(),
            loop_depth: 0,
            entry: None,
        }
    }

    fn finish(mut self) -> BindOutput {
        self.diagnostics.sort_by_key(|diagnostic| diagnostic.span.start);
        let functions = self.functions.into_iter().flatten().collect();
        BindOutput {
            program: BoundProgram {
                functions,
                imports: self.imports,
                slot_names: match self.kind {
                    UnitKind::Script { .. } => self.symbols.slot_names(),
                    UnitKind::Library { .. } => Vec::new(),
                },
                function_slots: self.function_slots,
                entry: self.entry,
                record: self.record,
            },
            symbols: self.symbols,
            diagnostics: self.diagnostics,
        }
    }

    fn bind_submission(&mut self, submission: &Submission) {
        let hoisted = self.hoist_functions(&submission.statements);

        match self.kind {
            UnitKind::Script { .. } => self.bind_entry(submission),
            UnitKind::Library { .. } => self.reject_library_statements(submission),
        }

        for (index, def) in hoisted {
            let function = self.bind_function(def);
            self.functions[index] = Some(function);
        }

        // Duplicates never get a body; an empty routine keeps indices stable.
        for (index, function) in self.functions.iter_mut().enumerate() {
            if function.is_none() {
                *function = Some(BoundFunction {
                    name: format!("{}.<invalid#{index}>", self.kind.qualifier()),
                    arity: 0,
                    locals: 0,
                    body: BoundBlock::default(),
                    line: 0,
                });
            }
        }
    }

    fn hoist_functions<'s>(&mut self, statements: &'s [Statement]) -> Vec<(usize, &'s FunctionDef)> {
        let mut hoisted = Vec::new();
        for statement in statements {
            let Statement::Function(def) = statement else {
                continue;
            };
            let index = self.functions.len();
            self.functions.push(None);
            if let Some(existing) = self.symbols.lookup(&def.name.name) {
                let first = line_col(self.source, existing.span.start).0;
                self.error(
                    CODE_DUPLICATE_DEFINITION,
                    format!("function `{}` is already defined", def.name.name),
                    def.name.span,
                    Some(format!("previous definition on line {first}")),
                );
                continue;
            }
            let arity = def.params.len();
            let slot = self
                .symbols
                .declare(&def.name.name, SymbolKind::Function { arity, index }, def.name.span)
                .slot;
            if matches!(self.kind, UnitKind::Script { .. }) {
                self.function_slots.push(FunctionSlot {
                    function: index,
                    slot,
                });
            }
            hoisted.push((index, def));
        }
        hoisted
    }

    fn bind_entry(&mut self, submission: &Submission) {
        self.frame = Frame::entry();
        let line = self.line(submission.span);
        let body = self.bind_statements(&submission.statements, submission.tail.as_deref());
        let index = self.functions.len();
        self.functions.push(Some(BoundFunction {
            name: format!("{}.{ENTRY_NAME}", self.kind.qualifier()),
            arity: 0,
            locals: self.frame.next_local,
            body,
            line,
        }));
        self.entry = Some(index);
        self.frame = Frame::default();
    }

    fn reject_library_statements(&mut self, submission: &Submission) {
        for statement in &submission.statements {
            if !matches!(statement, Statement::Function(_)) {
                self.error(
                    CODE_LIBRARY_STATEMENT,
                    "libraries may only contain function declarations",
                    statement.span(),
                    None,
                );
            }
        }
        if let Some(tail) = &submission.tail {
            self.error(
                CODE_LIBRARY_STATEMENT,
                "libraries may only contain function declarations",
                tail.span(),
                None,
            );
        }
    }

    fn bind_function(&mut self, def: &FunctionDef) -> BoundFunction {
        self.frame = Frame::function();
        let saved_loop_depth = std::mem::take(&mut self.loop_depth);
        for param in &def.params {
            let duplicate = self.frame.scopes[0]
                .iter()
                .any(|local| local.name == param.name);
            if duplicate {
                self.error(
                    CODE_DUPLICATE_DEFINITION,
                    format!("parameter `{}` is bound more than once", param.name),
                    param.span,
                    None,
                );
            }
            self.declare_local(&param.name, false, param.span);
        }

        let body = self.bind_block_contents(&def.body);
        self.pop_scope();

        let function = BoundFunction {
            name: format!("{}.{}", self.kind.qualifier(), def.name.name),
            arity: def.params.len(),
            locals: self.frame.next_local,
            body,
            line: self.line(def.span),
        };
        self.frame = Frame::default();
        self.loop_depth = saved_loop_depth;
        function
    }

    fn bind_block(&mut self, block: &Block) -> BoundBlock {
        self.frame.scopes.push(Vec::new());
        let bound = self.bind_block_contents(block);
        self.pop_scope();
        bound
    }

    fn bind_block_contents(&mut self, block: &Block) -> BoundBlock {
        self.bind_statements(&block.statements, block.tail.as_deref())
    }

    fn bind_statements(&mut self, statements: &[Statement], tail: Option<&Expr>) -> BoundBlock {
        let mut bound = BoundBlock::default();
        let mut diverged = false;
        let mut warned = false;

        for statement in statements {
            if diverged && !warned && !matches!(statement, Statement::Function(_)) {
                self.unreachable(statement.span());
                warned = true;
            }
            if let Some(stmt) = self.bind_statement(statement) {
                bound.statements.push(stmt);
            }
            diverged |= statement.diverges();
        }

        if let Some(expr) = tail {
            if diverged && !warned {
                self.unreachable(expr.span());
            }
            let line = self.line(expr.span());
            bound.tail = Some((line, Box::new(self.bind_expr(expr))));
        }
        bound
    }

    fn bind_statement(&mut self, statement: &Statement) -> Option<BoundStmt> {
        let line = self.line(statement.span());
        match statement {
            Statement::Let(stmt) => self.bind_let(stmt, line),
            Statement::Assign(stmt) => self.bind_assign(stmt, line),
            Statement::Function(def) => {
                if !self.frame.at_top_level() {
                    self.error(
                        CODE_NESTED_FUNCTION,
                        format!("function `{}` must be declared at the top level", def.name.name),
                        def.name.span,
                        Some("move the declaration out of the enclosing block".into()),
                    );
                }
                None
            }
            Statement::Expr(stmt) => Some(BoundStmt::Expr {
                expr: self.bind_expr(&stmt.expr),
                line,
            }),
            Statement::Return(stmt) => {
                let value = stmt.value.as_ref().map(|expr| self.bind_expr(expr));
                Some(BoundStmt::Return { value, line })
            }
            Statement::While(stmt) => {
                let condition = self.bind_expr(&stmt.condition);
                self.loop_depth += 1;
                let body = self.bind_block(&stmt.body);
                self.loop_depth -= 1;
                Some(BoundStmt::While {
                    condition,
                    body,
                    line,
                })
            }
            Statement::Break(span) => {
                self.check_loop_control("break", *span);
                Some(BoundStmt::Break { line })
            }
            Statement::Continue(span) => {
                self.check_loop_control("continue", *span);
                Some(BoundStmt::Continue { line })
            }
        }
    }

    fn bind_let(&mut self, stmt: &LetStmt, line: u32) -> Option<BoundStmt> {
        let value = stmt.value.as_ref().map(|expr| self.bind_expr(expr));
        let mutable = stmt.mutability == Mutability::Mutable;

        if self.frame.at_top_level() {
            if let Some(existing) = self.symbols.lookup(&stmt.name.name) {
                if matches!(existing.kind, SymbolKind::Function { .. }) {
                    self.error(
                        CODE_DUPLICATE_DEFINITION,
                        format!("`{}` is already defined as a function", stmt.name.name),
                        stmt.name.span,
                        None,
                    );
                    return None;
                }
            }
            let slot = self
                .symbols
                .declare(&stmt.name.name, SymbolKind::Variable { mutable }, stmt.name.span)
                .slot;
            let record = self.record?;
            return value.map(|value| BoundStmt::Store {
                place: Place::Slot {
                    record,
                    index: slot,
                },
                value,
                line,
            });
        }

        let index = self.declare_local(&stmt.name.name, mutable, stmt.name.span);
        Some(BoundStmt::Store {
            place: Place::Local(index),
            value: value.unwrap_or(BoundExpr::Unit),
            line,
        })
    }

    fn bind_assign(&mut self, stmt: &AssignStmt, line: u32) -> Option<BoundStmt> {
        let ident = match &stmt.target {
            AssignTarget::Index { base, index } => {
                let base = self.bind_expr(base);
                let index = self.bind_expr(index);
                let value = self.bind_expr(&stmt.value);
                return Some(BoundStmt::SetIndex {
                    base,
                    index,
                    value,
                    line,
                });
            }
            AssignTarget::Name(ident) => ident,
        };

        let value = self.bind_expr(&stmt.value);
        let place = match self.resolve_name(&ident.name, false) {
            Resolution::Local(index) => {
                if !self.local_is_mutable(index) {
                    self.immutable_assign(ident, "immutable binding");
                }
                Place::Local(index)
            }
            Resolution::Slot {
                record,
                index,
                kind,
            } => match kind {
                SymbolKind::Variable { mutable: true } => Place::Slot { record, index },
                SymbolKind::Variable { mutable: false } => {
                    self.immutable_assign(ident, "immutable binding");
                    Place::Slot { record, index }
                }
                SymbolKind::Function { .. } => {
                    self.immutable_assign(ident, "function");
                    return None;
                }
            },
            Resolution::Function { .. } => {
                self.immutable_assign(ident, "function");
                return None;
            }
            Resolution::Import { .. } | Resolution::Intrinsic(_) => {
                self.immutable_assign(ident, "imported function");
                return None;
            }
            Resolution::Ambiguous(namespaces) => {
                self.ambiguous(ident, &namespaces);
                return None;
            }
            Resolution::Unknown if self.frame.at_top_level() => {
                let record = self.record?;
                let slot = self
                    .symbols
                    .declare(&ident.name, SymbolKind::Variable { mutable: true }, ident.span)
                    .slot;
                self.diagnostics.push(Diagnostic::info(
                    CODE_IMPLICIT_DECLARATION,
                    format!("`{}` is implicitly declared as a session variable", ident.name),
                    ident.span,
                    self.source,
                ));
                Place::Slot {
                    record,
                    index: slot,
                }
            }
            Resolution::Unknown => {
                self.unknown_symbol(ident);
                return None;
            }
        };
        Some(BoundStmt::Store { place, value, line })
    }

    fn bind_expr(&mut self, expr: &Expr) -> BoundExpr {
        match expr {
            Expr::Identifier(ident) => self.bind_identifier(ident),
            Expr::Path {
                namespace, name, ..
            } => match self.resolve_path(namespace, name) {
                Some(Resolution::Import { import, .. }) => {
                    BoundExpr::Import(self.import_index(import))
                }
                Some(Resolution::Intrinsic(intrinsic)) => {
                    self.intrinsic_as_value(intrinsic, name.span);
                    BoundExpr::Unit
                }
                _ => BoundExpr::Unit,
            },
            Expr::Literal(literal) => match literal {
                Literal::Int(value, _) => BoundExpr::Int(*value),
                Literal::Float(value, _) => BoundExpr::Float(*value),
                Literal::Bool(value, _) => BoundExpr::Bool(*value),
                Literal::String(value, _) => BoundExpr::Str(value.clone()),
            },
            Expr::Binary {
                op, left, right, ..
            } => {
                if matches!(op, BinaryOp::Div | BinaryOp::Rem)
                    && matches!(right.as_ref(), Expr::Literal(Literal::Int(0, _)))
                {
                    self.diagnostics.push(
                        Diagnostic::warning(
                            CODE_DIVIDE_BY_ZERO,
                            format!("this `{}` always fails: the divisor is zero", op.symbol()),
                            right.span(),
                            self.source,
                        )
                        .with_help("evaluating it raises a division-by-zero fault"),
                    );
                }
                BoundExpr::Binary {
                    op: *op,
                    left: Box::new(self.bind_expr(left)),
                    right: Box::new(self.bind_expr(right)),
                }
            }
            Expr::Unary { op, expr, .. } => BoundExpr::Unary {
                op: *op,
                expr: Box::new(self.bind_expr(expr)),
            },
            Expr::Call { callee, args, span } => self.bind_call(callee, args, *span),
            Expr::Index { base, index, .. } => BoundExpr::Index {
                base: Box::new(self.bind_expr(base)),
                index: Box::new(self.bind_expr(index)),
            },
            Expr::List(items, _) => {
                BoundExpr::List(items.iter().map(|item| self.bind_expr(item)).collect())
            }
            Expr::If(if_expr) => self.bind_if(if_expr),
            Expr::Block(block) => BoundExpr::Block(self.bind_block(block)),
        }
    }

    fn bind_identifier(&mut self, ident: &Identifier) -> BoundExpr {
        match self.resolve_name(&ident.name, true) {
            Resolution::Local(index) => BoundExpr::Load(Place::Local(index)),
            Resolution::Function { index, .. } => BoundExpr::Function(index),
            Resolution::Slot { record, index, .. } => BoundExpr::Load(Place::Slot { record, index }),
            Resolution::Import { import, .. } => BoundExpr::Import(self.import_index(import)),
            Resolution::Intrinsic(intrinsic) => {
                self.intrinsic_as_value(intrinsic, ident.span);
                BoundExpr::Unit
            }
            Resolution::Ambiguous(namespaces) => {
                self.ambiguous(ident, &namespaces);
                BoundExpr::Unit
            }
            Resolution::Unknown => {
                self.unknown_symbol(ident);
                BoundExpr::Unit
            }
        }
    }

    fn bind_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> BoundExpr {
        let resolution = match callee {
            Expr::Identifier(ident) => Some((ident.name.clone(), self.resolve_name(&ident.name, true))),
            Expr::Path {
                namespace, name, ..
            } => Some((
                format!("{}::{}", namespace.name, name.name),
                self.resolve_path(namespace, name)
                    .unwrap_or(Resolution::Unknown),
            )),
            _ => None,
        };

        let arity = match &resolution {
            Some((_, Resolution::Function { arity, .. })) => Some(Arity::Exact(*arity)),
            Some((
                _,
                Resolution::Slot {
                    kind: SymbolKind::Function { arity, .. },
                    ..
                },
            )) => Some(Arity::Exact(*arity)),
            Some((_, Resolution::Import { arity, .. })) => Some(Arity::Exact(*arity)),
            Some((_, Resolution::Intrinsic(intrinsic))) => Some(intrinsic.arity()),
            _ => None,
        };
        if let (Some(arity), Some((name, _))) = (arity, &resolution) {
            if !arity.accepts(args.len()) {
                self.diagnostics.push(Diagnostic::error(
                    CODE_ARITY_MISMATCH,
                    format!(
                        "`{name}` takes {arity} but {} {} supplied",
                        args.len(),
                        if args.len() == 1 { "was" } else { "were" }
                    ),
                    span,
                    self.source,
                ));
            }
        }

        let args: Vec<BoundExpr> = args.iter().map(|arg| self.bind_expr(arg)).collect();
        let callee = match resolution {
            Some((_, Resolution::Intrinsic(intrinsic))) => {
                return BoundExpr::Intrinsic { intrinsic, args };
            }
            Some((_, Resolution::Local(index))) => BoundExpr::Load(Place::Local(index)),
            Some((_, Resolution::Function { index, .. })) => BoundExpr::Function(index),
            Some((_, Resolution::Slot { record, index, .. })) => {
                BoundExpr::Load(Place::Slot { record, index })
            }
            Some((_, Resolution::Import { import, .. })) => {
                BoundExpr::Import(self.import_index(import))
            }
            Some((_, Resolution::Ambiguous(namespaces))) => {
                if let Expr::Identifier(ident) = callee {
                    self.ambiguous(ident, &namespaces);
                }
                BoundExpr::Unit
            }
            Some((_, Resolution::Unknown)) => {
                if let Expr::Identifier(ident) = callee {
                    self.unknown_symbol(ident);
                }
                BoundExpr::Unit
            }
            None => self.bind_expr(callee),
        };
        BoundExpr::Call {
            callee: Box::new(callee),
            args,
        }
    }

    fn bind_if(&mut self, if_expr: &IfExpr) -> BoundExpr {
        let condition = self.bind_expr(&if_expr.condition);
        let then_branch = self.bind_block(&if_expr.then_branch);
        let else_branch = match &if_expr.else_branch {
            Some(ElseBranch::Block(block)) => Some(self.bind_block(block)),
            Some(ElseBranch::If(nested)) => {
                let line = self.line(nested.span);
                Some(BoundBlock {
                    statements: Vec::new(),
                    tail: Some((line, Box::new(self.bind_if(nested)))),
                })
            }
            None => None,
        };
        BoundExpr::If {
            condition: Box::new(condition),
            then_branch,
            else_branch,
        }
    }

    fn resolve_name(&mut self, name: &str, reading: bool) -> Resolution {
        for scope in self.frame.scopes.iter_mut().rev() {
            if let Some(local) = scope.iter_mut().rev().find(|local| local.name == name) {
                if reading {
                    local.used = true;
                }
                return Resolution::Local(local.index);
            }
        }

        if let Some(symbol) = self.symbols.lookup(name) {
            return match (symbol.kind, self.record) {
                (SymbolKind::Function { arity, index }, _) => Resolution::Function { index, arity },
                (kind, Some(record)) => Resolution::Slot {
                    record,
                    index: symbol.slot,
                    kind,
                },
                (_, None) => Resolution::Unknown,
            };
        }

        let mut unit = self.previous;
        while let Some(current) = unit {
            if let (Some(symbol), Some(record)) =
                (current.symbols().lookup(name), current.record_index())
            {
                return Resolution::Slot {
                    record,
                    index: symbol.slot,
                    kind: symbol.kind,
                };
            }
            unit = current.previous();
        }

        let mut candidates = Vec::new();
        for namespace in self.implicit_imports {
            if let Some(export) = self
                .references
                .library(namespace)
                .and_then(|library| library.export(name))
            {
                candidates.push((namespace.clone(), export.arity));
            }
        }
        match candidates.len() {
            0 => {}
            1 => {
                let (namespace, arity) = candidates.remove(0);
                return Resolution::Import {
                    import: ImportRef {
                        namespace,
                        name: name.to_string(),
                    },
                    arity,
                };
            }
            _ => {
                return Resolution::Ambiguous(
                    candidates.into_iter().map(|(namespace, _)| namespace).collect(),
                )
            }
        }

        match Intrinsic::from_name(name) {
            Some(intrinsic) => Resolution::Intrinsic(intrinsic),
            None => Resolution::Unknown,
        }
    }

    /// Resolves `namespace::name`, reporting failures itself.
    fn resolve_path(&mut self, namespace: &Identifier, name: &Identifier) -> Option<Resolution> {
        if namespace.name == Intrinsic::NAMESPACE {
            return match Intrinsic::from_name(&name.name) {
                Some(intrinsic) => Some(Resolution::Intrinsic(intrinsic)),
                None => {
                    self.missing_export(namespace, name);
                    None
                }
            };
        }

        let Some(library) = self.references.library(&namespace.name) else {
            self.error(
                CODE_UNKNOWN_NAMESPACE,
                format!("no referenced library provides namespace `{}`", namespace.name),
                namespace.span,
                None,
            );
            return None;
        };
        match library.export(&name.name) {
            Some(export) => Some(Resolution::Import {
                import: ImportRef {
                    namespace: namespace.name.clone(),
                    name: name.name.clone(),
                },
                arity: export.arity,
            }),
            None => {
                self.missing_export(namespace, name);
                None
            }
        }
    }

    fn import_index(&mut self, import: ImportRef) -> usize {
        match self.imports.iter().position(|existing| *existing == import) {
            Some(index) => index,
            None => {
                self.imports.push(import);
                self.imports.len() - 1
            }
        }
    }

    fn declare_local(&mut self, name: &str, mutable: bool, span: Span) -> usize {
        let index = self.frame.next_local;
        self.frame.next_local += 1;
        if let Some(scope) = self.frame.scopes.last_mut() {
            scope.push(Local {
                name: name.to_string(),
                index,
                mutable,
                used: false,
                span,
            });
        }
        index
    }

    fn local_is_mutable(&self, index: usize) -> bool {
        self.frame
            .scopes
            .iter()
            .flatten()
            .find(|local| local.index == index)
            .is_some_and(|local| local.mutable)
    }

    fn pop_scope(&mut self) {
        let Some(scope) = self.frame.scopes.pop() else {
            return;
        };
        for local in scope {
            if !local.used && !local.name.starts_with('_') {
                self.diagnostics.push(
                    Diagnostic::warning(
                        CODE_UNUSED_VARIABLE,
                        format!("unused variable `{}`", local.name),
                        local.span,
                        self.source,
                    )
                    .with_help(format!(
                        "if this is intentional, prefix it with an underscore: `_{}`",
                        local.name
                    )),
                );
            }
        }
    }

    fn check_loop_control(&mut self, keyword: &str, span: Span) {
        if self.loop_depth == 0 {
            self.error(
                CODE_LOOP_CONTROL,
                format!("`{keyword}` outside of a loop"),
                span,
                None,
            );
        }
    }

    fn line(&self, span: Span) -> u32 {
        u32::try_from(line_col(self.source, span.start).0).unwrap_or(u32::MAX)
    }

    fn error(
        &mut self,
        code: &'static str,
        message: impl Into<String>,
        span: Span,
        help: Option<String>,
    ) {
        let mut diagnostic = Diagnostic::error(code, message, span, self.source);
        diagnostic.help = help;
        self.diagnostics.push(diagnostic);
    }

    fn unreachable(&mut self, span: Span) {
        self.diagnostics.push(Diagnostic::warning(
            CODE_UNREACHABLE,
            "unreachable code",
            span,
            self.source,
        ));
    }

    fn unknown_symbol(&mut self, ident: &Identifier) {
        self.error(
            CODE_UNKNOWN_SYMBOL,
            format!("cannot find `{}` in this scope", ident.name),
            ident.span,
            None,
        );
    }

    fn missing_export(&mut self, namespace: &Identifier, name: &Identifier) {
        self.error(
            CODE_UNKNOWN_SYMBOL,
            format!("`{}` has no export named `{}`", namespace.name, name.name),
            name.span,
            None,
        );
    }

    fn ambiguous(&mut self, ident: &Identifier, namespaces: &[String]) {
        let qualified = namespaces
            .iter()
            .map(|namespace| format!("`{namespace}::{}`", ident.name))
            .collect::<Vec<_>>()
            .join(" or ");
        self.error(
            CODE_AMBIGUOUS_IMPORT,
            format!("`{}` is exported by more than one imported namespace", ident.name),
            ident.span,
            Some(format!("write {qualified}")),
        );
    }

    fn immutable_assign(&mut self, ident: &Identifier, what: &str) {
        self.error(
            CODE_IMMUTABLE_ASSIGN,
            format!("cannot assign to {what} `{}`", ident.name),
            ident.span,
            Some(format!("declare it with `let mut {}`", ident.name)).filter(|_| what == "immutable binding"),
        );
    }

    fn intrinsic_as_value(&mut self, intrinsic: Intrinsic, span: Span) {
        self.error(
            CODE_UNKNOWN_SYMBOL,
            format!("intrinsic `{}` can only be called directly", intrinsic.name()),
            span,
            None,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser::parse_submission;

    fn bind_script(source: &str) -> BindOutput {
        let submission = parse_submission(source).expect("parse");
        let kind = UnitKind::Script { ordinal: 1 };
        let references = ReferenceSet::empty();
        bind(
            BindContext {
                source,
                kind: &kind,
                previous: None,
                references: &references,
                implicit_imports: &[],
            },
            &submission,
        )
    }

    fn codes(output: &BindOutput) -> Vec<&'static str> {
        output.diagnostics.iter().map(|d| d.code).collect()
    }

    #[test]
    fn top_level_lets_become_session_slots() {
        let output = bind_script("let a = 1; let mut b = a; fn f(x) { x + b }");
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        assert_eq!(output.program.slot_names, vec!["f", "a", "b"]);
        assert_eq!(output.program.function_slots.len(), 1);
        let entry = output.program.entry.expect("entry");
        assert_eq!(output.program.functions[entry].name, "Submission#1.<Main>");
        assert_eq!(output.program.functions[0].name, "Submission#1.f");
    }

    #[test]
    fn implicit_declaration_is_informational() {
        let output = bind_script("x = 5;");
        assert_eq!(codes(&output), vec![CODE_IMPLICIT_DECLARATION]);
        assert_eq!(output.diagnostics[0].severity, Severity::Info);
        assert!(output.symbols.lookup("x").expect("x").is_mutable());
    }

    #[test]
    fn reports_errors_in_source_order() {
        let output = bind_script("let a = 1; a = 2; missing; break;");
        assert_eq!(
            codes(&output),
            vec![CODE_IMMUTABLE_ASSIGN, CODE_UNKNOWN_SYMBOL, CODE_LOOP_CONTROL]
        );
    }

    #[test]
    fn warns_about_unused_locals_and_dead_code() {
        let output = bind_script("fn f(_x) { let y = 1; return 2; 3 } f(1) / 0");
        assert_eq!(
            codes(&output),
            vec![CODE_UNUSED_VARIABLE, CODE_UNREACHABLE, CODE_DIVIDE_BY_ZERO]
        );
        assert!(output.diagnostics.iter().all(|d| !d.is_error()));
    }

    #[test]
    fn checks_arity_of_known_callees() {
        let output = bind_script("fn add(a, b) { a + b } add(1); len(1, 2);");
        assert_eq!(codes(&output), vec![CODE_ARITY_MISMATCH, CODE_ARITY_MISMATCH]);
        assert_eq!(
            output.diagnostics[0].message,
            "`add` takes 2 arguments but 1 was supplied"
        );
    }

    #[test]
    fn rejects_nested_and_duplicate_functions() {
        let output = bind_script("fn f() { 1 } fn f() { 2 } { fn g() { 3 } }");
        assert_eq!(
            codes(&output),
            vec![CODE_DUPLICATE_DEFINITION, CODE_NESTED_FUNCTION]
        );
    }

    #[test]
    fn unknown_namespace_is_reported() {
        let output = bind_script("nope::thing(1)");
        assert_eq!(codes(&output), vec![CODE_UNKNOWN_NAMESPACE]);
    }

    #[test]
    fn library_mode_only_accepts_functions() {
        let source = "fn double(x) { x * 2 } let y = 1;";
        let submission = parse_submission(source).expect("parse");
        let kind = UnitKind::Library {
            namespace: "demo".into(),
        };
        let references = ReferenceSet::empty();
        let output = bind(
            BindContext {
                source,
                kind: &kind,
                previous: None,
                references: &references,
                implicit_imports: &[],
            },
            &submission,
        );
        assert_eq!(codes(&output), vec![CODE_LIBRARY_STATEMENT]);
        assert!(output.program.entry.is_none());
        assert_eq!(output.program.functions[0].name, "demo.double");
    }
}
