use crate::language::span::Span;

/// One parsed fragment: a script submission or a library source file.
#[derive(Clone, Debug)]
pub struct Submission {
    pub statements: Vec<Statement>,
    pub tail: Option<Box<Expr>>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Mutability {
    #[default]
    Immutable,
    Mutable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Statement {
    Let(LetStmt),
    Assign(AssignStmt),
    Function(FunctionDef),
    Expr(ExprStmt),
    Return(ReturnStmt),
    While(WhileStmt),
    Break(Span),
    Continue(Span),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Let(stmt) => stmt.span,
            Statement::Assign(stmt) => stmt.span,
            Statement::Function(def) => def.span,
            Statement::Expr(stmt) => stmt.span,
            Statement::Return(stmt) => stmt.span,
            Statement::While(stmt) => stmt.span,
            Statement::Break(span) | Statement::Continue(span) => *span,
        }
    }

    /// Control never reaches the statement after this one.
    pub fn diverges(&self) -> bool {
        matches!(
            self,
            Statement::Return(_) | Statement::Break(_) | Statement::Continue(_)
        )
    }
}

#[derive(Clone, Debug)]
pub struct LetStmt {
    pub name: Identifier,
    pub mutability: Mutability,
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct AssignStmt {
    pub target: AssignTarget,
    pub value: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum AssignTarget {
    Name(Identifier),
    Index { base: Box<Expr>, index: Box<Expr> },
}

#[derive(Clone, Debug)]
pub struct FunctionDef {
    pub name: Identifier,
    pub params: Vec<Identifier>,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub tail: Option<Box<Expr>>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct IfExpr {
    pub condition: Expr,
    pub then_branch: Block,
    pub else_branch: Option<ElseBranch>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum ElseBranch {
    Block(Block),
    If(Box<IfExpr>),
}

#[derive(Clone, Debug)]
pub enum Expr {
    Identifier(Identifier),
    Path {
        namespace: Identifier,
        name: Identifier,
        span: Span,
    },
    Literal(Literal),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    List(Vec<Expr>, Span),
    If(Box<IfExpr>),
    Block(Box<Block>),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Identifier(ident) => ident.span,
            Expr::Literal(literal) => literal.span(),
            Expr::Path { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Index { span, .. }
            | Expr::List(_, span) => *span,
            Expr::If(expr) => expr.span,
            Expr::Block(block) => block.span,
        }
    }

    /// Block-like expressions may stand as statements without a trailing `;`.
    pub fn is_block_like(&self) -> bool {
        matches!(self, Expr::If(_) | Expr::Block(_))
    }
}

#[derive(Clone, Debug)]
pub enum Literal {
    Int(i64, Span),
    Float(f64, Span),
    Bool(bool, Span),
    String(String, Span),
}

impl Literal {
    pub fn span(&self) -> Span {
        match self {
            Literal::Int(_, span)
            | Literal::Float(_, span)
            | Literal::Bool(_, span)
            | Literal::String(_, span) => *span,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}
