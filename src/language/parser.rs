use crate::language::{
    ast::*,
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    span::Span,
    token::{Token, TokenKind},
};

/// Parses one interactive fragment: top-level statements with an optional
/// trailing result expression. No enclosing declaration is required.
pub fn parse_submission(source: &str) -> Result<Submission, SyntaxErrors> {
    let tokens = lex(source).map_err(|errors| {
        SyntaxErrors::new(errors.into_iter().map(SyntaxError::from).collect())
    })?;
    Parser::new(tokens).parse()
}

/// Deepest syntax tree the parser builds. Later passes recurse over the tree,
/// so this also bounds their stack use.
pub const MAX_NESTING: usize = 200;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
    suppress_block_literal: bool,
    /// Current recursion level.
    depth: usize,
    /// Deepest level reached by the expression being built.
    peak: usize,
}

#[derive(Debug)]
enum StatementOrTail {
    Statement(Statement),
    Tail(Expr),
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            suppress_block_literal: false,
            depth: 0,
            peak: 0,
        }
    }

    fn parse(mut self) -> Result<Submission, SyntaxErrors> {
        let mut statements = Vec::new();
        let mut tail = None;

        while !self.is_eof() {
            if self.matches(TokenKind::Semi) {
                continue;
            }
            self.depth = 0;
            self.peak = 0;
            match self.parse_statement(true) {
                Ok(StatementOrTail::Statement(stmt)) => statements.push(stmt),
                Ok(StatementOrTail::Tail(expr)) => {
                    if self.is_eof() {
                        tail = Some(Box::new(expr));
                    } else {
                        let err = self.error_here("Expected ';' after expression");
                        self.report(err);
                        self.synchronize_statement();
                    }
                }
                Err(err) => {
                    self.report(err);
                    self.synchronize_statement();
                }
            }
        }

        let end = self.current_span_start();
        if self.errors.is_empty() {
            Ok(Submission {
                statements,
                tail,
                span: Span::new(0, end),
            })
        } else {
            Err(SyntaxErrors::new(self.errors))
        }
    }

    fn parse_function(&mut self, start: usize) -> Result<FunctionDef, SyntaxError> {
        let name = self.expect_identifier("Expected function name")?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.expect_identifier("Expected parameter name")?);
                if self.matches(TokenKind::Comma) {
                    if self.check(TokenKind::RParen) {
                        break;
                    }
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        let span = Span::new(start, body.span.end);
        Ok(FunctionDef {
            name,
            params,
            body,
            span,
        })
    }

    fn parse_block(&mut self) -> Result<Block, SyntaxError> {
        self.nested(Self::parse_block_body)
    }

    fn parse_block_body(&mut self) -> Result<Block, SyntaxError> {
        let start = self.expect(TokenKind::LBrace)?.span.start;
        let mut statements = Vec::new();
        let mut tail = None;
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            if self.matches(TokenKind::Semi) {
                continue;
            }
            match self.parse_statement(true)? {
                StatementOrTail::Statement(stmt) => statements.push(stmt),
                StatementOrTail::Tail(expr) => {
                    tail = Some(Box::new(expr));
                    break;
                }
            }
        }
        let end = self.expect(TokenKind::RBrace)?.span.end;
        Ok(Block {
            statements,
            tail,
            span: Span::new(start, end),
        })
    }

    fn parse_statement(&mut self, allow_tail: bool) -> Result<StatementOrTail, SyntaxError> {
        if self.matches(TokenKind::Let) {
            let start = self.previous_start();
            let stmt = self.parse_let(start)?;
            self.expect(TokenKind::Semi)?;
            return Ok(StatementOrTail::Statement(Statement::Let(stmt)));
        }
        if self.matches(TokenKind::Fn) {
            let start = self.previous_start();
            let def = self.parse_function(start)?;
            return Ok(StatementOrTail::Statement(Statement::Function(def)));
        }
        if self.matches(TokenKind::Return) {
            let stmt = self.parse_return()?;
            return Ok(StatementOrTail::Statement(Statement::Return(stmt)));
        }
        if self.matches(TokenKind::While) {
            let stmt = self.parse_while()?;
            return Ok(StatementOrTail::Statement(Statement::While(stmt)));
        }
        if self.matches(TokenKind::Break) {
            let span = self.previous_span();
            self.expect(TokenKind::Semi)?;
            return Ok(StatementOrTail::Statement(Statement::Break(span)));
        }
        if self.matches(TokenKind::Continue) {
            let span = self.previous_span();
            self.expect(TokenKind::Semi)?;
            return Ok(StatementOrTail::Statement(Statement::Continue(span)));
        }

        self.parse_expression_statement(allow_tail)
    }

    fn parse_expression_statement(
        &mut self,
        allow_tail: bool,
    ) -> Result<StatementOrTail, SyntaxError> {
        let expr = self.parse_expression()?;

        if self.matches(TokenKind::Eq) {
            let target = match expr {
                Expr::Identifier(ident) => AssignTarget::Name(ident),
                Expr::Index { base, index, .. } => AssignTarget::Index { base, index },
                other => {
                    return Err(SyntaxError::new("Invalid assignment target", other.span())
                        .with_help("only names and indexed elements can be assigned"));
                }
            };
            let value = self.parse_expression()?;
            let start = match &target {
                AssignTarget::Name(ident) => ident.span.start,
                AssignTarget::Index { base, .. } => base.span().start,
            };
            let end = self.expect(TokenKind::Semi)?.span.end;
            return Ok(StatementOrTail::Statement(Statement::Assign(AssignStmt {
                target,
                value,
                span: Span::new(start, end),
            })));
        }

        let span = expr.span();
        if self.matches(TokenKind::Semi) {
            return Ok(StatementOrTail::Statement(Statement::Expr(ExprStmt {
                expr,
                span,
            })));
        }
        let at_end = self.check(TokenKind::RBrace) || self.is_eof();
        if expr.is_block_like() && !at_end {
            return Ok(StatementOrTail::Statement(Statement::Expr(ExprStmt {
                expr,
                span,
            })));
        }
        if allow_tail {
            Ok(StatementOrTail::Tail(expr))
        } else {
            Err(self.error_here("Expected ';' after expression"))
        }
    }

    fn parse_let(&mut self, start: usize) -> Result<LetStmt, SyntaxError> {
        let mutability = if self.matches(TokenKind::Mut) {
            Mutability::Mutable
        } else {
            Mutability::Immutable
        };

        let name = self.expect_identifier("Expected binding name")?;

        let value = if self.matches(TokenKind::Eq) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let end = value
            .as_ref()
            .map(|expr| expr.span().end)
            .unwrap_or(name.span.end);

        Ok(LetStmt {
            name,
            mutability,
            value,
            span: Span::new(start, end),
        })
    }

    fn parse_return(&mut self) -> Result<ReturnStmt, SyntaxError> {
        let start = self.previous_start();
        if self.check(TokenKind::Semi) {
            let end = self.advance().span.end;
            return Ok(ReturnStmt {
                value: None,
                span: Span::new(start, end),
            });
        }
        let value = self.parse_expression()?;
        let end = self.expect(TokenKind::Semi)?.span.end;
        Ok(ReturnStmt {
            value: Some(value),
            span: Span::new(start, end),
        })
    }

    fn parse_while(&mut self) -> Result<WhileStmt, SyntaxError> {
        let start = self.previous_start();
        let condition = self.parse_condition()?;
        let body = self.parse_block()?;
        let body_end = body.span.end;
        Ok(WhileStmt {
            condition,
            body,
            span: Span::new(start, body_end),
        })
    }

    fn parse_condition(&mut self) -> Result<Expr, SyntaxError> {
        let prev_flag = self.suppress_block_literal;
        self.suppress_block_literal = true;
        let condition = self.parse_expression();
        self.suppress_block_literal = prev_flag;
        condition
    }

    fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let outer_peak = std::mem::replace(&mut self.peak, self.depth);
        let mut left = self.parse_unary()?;

        while let Some((op, prec)) = self.current_binary_op() {
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.parse_binary(prec + 1)?;
            let span = left.span().union(right.span());
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
            self.deepen()?;
        }

        self.peak = self.peak.max(outer_peak);
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        self.nested(Self::parse_unary_body)
    }

    fn parse_unary_body(&mut self) -> Result<Expr, SyntaxError> {
        let op = if self.check(TokenKind::Minus) {
            UnaryOp::Neg
        } else if self.check(TokenKind::Bang) {
            UnaryOp::Not
        } else {
            return self.parse_postfix();
        };
        let start = self.advance().span.start;
        let expr = self.parse_unary()?;
        if let (UnaryOp::Neg, Expr::Literal(Literal::Int(value, span))) = (op, &expr) {
            return Ok(Expr::Literal(Literal::Int(
                value.wrapping_neg(),
                Span::new(start, span.end),
            )));
        }
        let span = Span::new(start, expr.span().end);
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
            span,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let outer_peak = std::mem::replace(&mut self.peak, self.depth);
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(TokenKind::LParen) {
                let span_start = expr.span().start;
                let args = self.parse_comma_list(TokenKind::RParen)?;
                let end = self.expect(TokenKind::RParen)?.span.end;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    span: Span::new(span_start, end),
                };
            } else if self.matches(TokenKind::LBracket) {
                let span_start = expr.span().start;
                let index = self.parse_expression()?;
                let end = self.expect(TokenKind::RBracket)?.span.end;
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                    span: Span::new(span_start, end),
                };
            } else {
                break;
            }
            self.deepen()?;
        }
        self.peak = self.peak.max(outer_peak);
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        if self.matches(TokenKind::If) {
            return self.parse_if_expression().map(|expr| Expr::If(Box::new(expr)));
        }
        if !self.suppress_block_literal && self.check(TokenKind::LBrace) {
            let block = self.parse_block()?;
            return Ok(Expr::Block(Box::new(block)));
        }

        match self.peek_kind() {
            Some(TokenKind::Identifier(_)) => self.parse_identifier_expression(),
            Some(TokenKind::Integer(value)) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Int(value, span)))
            }
            Some(TokenKind::Float(value)) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Float(value, span)))
            }
            Some(TokenKind::String(value)) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::String(value, span)))
            }
            Some(TokenKind::True) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Bool(true, span)))
            }
            Some(TokenKind::False) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Bool(false, span)))
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let prev_flag = self.suppress_block_literal;
                self.suppress_block_literal = false;
                let inner = self.parse_expression();
                self.suppress_block_literal = prev_flag;
                let inner = inner?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            Some(TokenKind::LBracket) => {
                let start = self.advance().span.start;
                let items = self.parse_comma_list(TokenKind::RBracket)?;
                let end = self.expect(TokenKind::RBracket)?.span.end;
                Ok(Expr::List(items, Span::new(start, end)))
            }
            _ => Err(self.error_here("Unexpected token in expression")),
        }
    }

    fn parse_identifier_expression(&mut self) -> Result<Expr, SyntaxError> {
        let ident = self.expect_identifier("Expected identifier")?;
        if self.matches(TokenKind::ColonColon) {
            let name = self.expect_identifier("Expected name after '::'")?;
            let span = ident.span.union(name.span);
            return Ok(Expr::Path {
                namespace: ident,
                name,
                span,
            });
        }
        Ok(Expr::Identifier(ident))
    }

    fn parse_if_expression(&mut self) -> Result<IfExpr, SyntaxError> {
        self.nested(Self::parse_if_body)
    }

    fn parse_if_body(&mut self) -> Result<IfExpr, SyntaxError> {
        let start = self.previous_start();
        let condition = self.parse_condition()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.matches(TokenKind::Else) {
            if self.matches(TokenKind::If) {
                Some(ElseBranch::If(Box::new(self.parse_if_expression()?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };
        let end = match &else_branch {
            Some(ElseBranch::Block(block)) => block.span.end,
            Some(ElseBranch::If(expr)) => expr.span.end,
            None => then_branch.span.end,
        };
        Ok(IfExpr {
            condition,
            then_branch,
            else_branch,
            span: Span::new(start, end),
        })
    }

    fn parse_comma_list(&mut self, close: TokenKind) -> Result<Vec<Expr>, SyntaxError> {
        let prev_flag = self.suppress_block_literal;
        self.suppress_block_literal = false;
        let mut items = Vec::new();
        let result = loop {
            if self.check(close.clone()) {
                break Ok(());
            }
            match self.parse_expression() {
                Ok(expr) => items.push(expr),
                Err(err) => break Err(err),
            }
            if !self.matches(TokenKind::Comma) {
                break Ok(());
            }
        };
        self.suppress_block_literal = prev_flag;
        result.map(|_| items)
    }

    fn current_binary_op(&self) -> Option<(BinaryOp, u8)> {
        match self.peek_kind() {
            Some(TokenKind::Plus) => Some((BinaryOp::Add, 10)),
            Some(TokenKind::Minus) => Some((BinaryOp::Sub, 10)),
            Some(TokenKind::Star) => Some((BinaryOp::Mul, 20)),
            Some(TokenKind::Slash) => Some((BinaryOp::Div, 20)),
            Some(TokenKind::Percent) => Some((BinaryOp::Rem, 20)),
            Some(TokenKind::AmpersandAmpersand) => Some((BinaryOp::And, 4)),
            Some(TokenKind::PipePipe) => Some((BinaryOp::Or, 3)),
            Some(TokenKind::EqEq) => Some((BinaryOp::Eq, 5)),
            Some(TokenKind::BangEq) => Some((BinaryOp::NotEq, 5)),
            Some(TokenKind::Lt) => Some((BinaryOp::Lt, 9)),
            Some(TokenKind::LtEq) => Some((BinaryOp::LtEq, 9)),
            Some(TokenKind::Gt) => Some((BinaryOp::Gt, 9)),
            Some(TokenKind::GtEq) => Some((BinaryOp::GtEq, 9)),
            _ => None,
        }
    }

    fn expect_identifier(&mut self, msg: &str) -> Result<Identifier, SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::Identifier(name)) => {
                let span = self.advance().span;
                Ok(Identifier { name, span })
            }
            _ => Err(self.error_here(msg)),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token, SyntaxError> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else {
            let found = self
                .peek_kind()
                .map(|found| found.describe())
                .unwrap_or_else(|| "end of input".into());
            Err(self.error_here(&format!("Expected {}, found {found}", kind.describe())))
        }
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        matches!(self.peek_kind(), Some(tk) if tk == kind)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind.clone())
    }

    fn advance(&mut self) -> &Token {
        let index = self.pos.min(self.tokens.len().saturating_sub(1));
        self.pos = (self.pos + 1).min(self.tokens.len());
        &self.tokens[index]
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Eof) | None)
    }

    fn current_span_start(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.span.start)
            .unwrap_or_else(|| self.tokens.last().map(|t| t.span.end).unwrap_or(0))
    }

    fn previous_span(&self) -> Span {
        if self.pos == 0 {
            Span::new(0, 0)
        } else {
            self.tokens[self.pos - 1].span
        }
    }

    fn previous_start(&self) -> usize {
        self.previous_span().start
    }

    fn error_here(&self, message: &str) -> SyntaxError {
        let span = self
            .tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or_else(|| {
                self.tokens
                    .last()
                    .map(|t| t.span)
                    .unwrap_or_else(|| Span::new(0, 0))
            });
        SyntaxError::new(message.to_string(), span)
    }

    /// Runs `parse` one level deeper, failing once the limit is passed.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.depth >= MAX_NESTING {
            return Err(SyntaxError::too_deep(MAX_NESTING, self.previous_or_current_span()));
        }
        self.depth += 1;
        self.peak = self.peak.max(self.depth);
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Accounts for a node wrapped around everything parsed since the
    /// enclosing chain started.
    fn deepen(&mut self) -> Result<(), SyntaxError> {
        self.peak += 1;
        if self.peak > MAX_NESTING {
            return Err(SyntaxError::too_deep(MAX_NESTING, self.previous_span()));
        }
        Ok(())
    }

    fn previous_or_current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or_else(|| self.previous_span())
    }

    fn report(&mut self, err: SyntaxError) {
        self.errors.push(err);
    }

    /// Skips to the next plausible statement start at brace depth zero.
    fn synchronize_statement(&mut self) {
        let mut depth = 0usize;
        while !self.is_eof() {
            match self.peek_kind() {
                Some(TokenKind::LBrace) => depth += 1,
                Some(TokenKind::RBrace) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                Some(TokenKind::Semi) if depth == 0 => {
                    self.advance();
                    return;
                }
                Some(TokenKind::Let | TokenKind::Fn | TokenKind::While | TokenKind::Return)
                    if depth == 0 =>
                {
                    return;
                }
                _ => {}
            }
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::errors::SyntaxErrorKind;

    #[test]
    fn trailing_expression_becomes_tail() {
        let submission = parse_submission("let x = 2; x * 3").expect("parse");
        assert_eq!(submission.statements.len(), 1);
        assert!(matches!(
            submission.tail.as_deref(),
            Some(Expr::Binary {
                op: BinaryOp::Mul,
                ..
            })
        ));
    }

    #[test]
    fn precedence_binds_multiplication_tighter() {
        let submission = parse_submission("1 + 2 * 3").expect("parse");
        let Some(Expr::Binary { op, right, .. }) = submission.tail.as_deref() else {
            panic!("expected binary tail");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            right.as_ref(),
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn if_statement_needs_no_semicolon_mid_block() {
        let source = "let mut n = 0; if n < 1 { n = 1; } n";
        let submission = parse_submission(source).expect("parse");
        assert_eq!(submission.statements.len(), 2);
        assert!(submission.tail.is_some());
    }

    #[test]
    fn while_condition_does_not_swallow_body() {
        let source = "let mut i = 0; while i < 3 { i = i + 1; }";
        let submission = parse_submission(source).expect("parse");
        let Statement::While(stmt) = &submission.statements[1] else {
            panic!("expected while");
        };
        assert_eq!(stmt.body.statements.len(), 1);
    }

    #[test]
    fn parses_functions_paths_and_index_assignment() {
        let source = "fn twice(f, x) { f(f(x)) } let xs = [1, 2]; xs[0] = math::abs(-4);";
        let submission = parse_submission(source).expect("parse");
        assert!(matches!(submission.statements[0], Statement::Function(_)));
        let Statement::Assign(assign) = &submission.statements[2] else {
            panic!("expected assignment");
        };
        assert!(matches!(assign.target, AssignTarget::Index { .. }));
        assert!(matches!(assign.value, Expr::Call { .. }));
    }

    #[test]
    fn negative_literal_folds() {
        let submission = parse_submission("-9223372036854775807 - 1").expect("parse");
        let Some(Expr::Binary { left, .. }) = submission.tail.as_deref() else {
            panic!("expected binary");
        };
        assert!(matches!(
            left.as_ref(),
            Expr::Literal(Literal::Int(-9223372036854775807, _))
        ));
    }

    #[test]
    fn recovers_and_reports_every_bad_statement() {
        let errors = parse_submission("let = 1; let y = ; let ok = 2;").unwrap_err();
        assert_eq!(errors.errors.len(), 2);
        assert_eq!(errors.errors[0].message, "Expected binding name");
    }

    #[test]
    fn missing_semicolon_between_expressions_is_an_error() {
        let errors = parse_submission("1 + 1 2").unwrap_err();
        assert_eq!(errors.errors[0].message, "Expected ';' after expression");
    }

    #[test]
    fn rejects_assignment_to_call() {
        let errors = parse_submission("f() = 1;").unwrap_err();
        assert_eq!(errors.errors[0].message, "Invalid assignment target");
    }

    fn too_deep(source: &str) -> bool {
        match parse_submission(source) {
            Ok(_) => false,
            Err(errors) => errors
                .errors
                .iter()
                .any(|err| err.kind == SyntaxErrorKind::TooDeep),
        }
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let parens = format!("{}1{}", "(".repeat(2_000), ")".repeat(2_000));
        assert!(too_deep(&parens));
        let blocks = format!("{}1{}", "{".repeat(1_000), "}".repeat(1_000));
        assert!(too_deep(&blocks));
        let lists = format!("{}{}", "[".repeat(1_000), "]".repeat(1_000));
        assert!(too_deep(&lists));
        assert!(too_deep(&"-".repeat(5_000)));
        assert!(too_deep(&format!("f{}", "()".repeat(1_000))));
        assert!(too_deep(&format!("1{}", " + 1".repeat(5_000))));
        let branches = format!("if a {{ 1 }}{} else {{ 3 }}", " else if b { 2 }".repeat(1_000));
        assert!(too_deep(&branches));
    }

    #[test]
    fn moderate_nesting_still_parses() {
        let parens = format!("{}1{}", "(".repeat(150), ")".repeat(150));
        assert!(parse_submission(&parens).is_ok());
        let sum = format!("1{}", " + 1".repeat(150));
        assert!(parse_submission(&sum).is_ok());
        let mixed = format!("[{}]", vec!["(1 + 2) * 3"; 150].join(", "));
        assert!(parse_submission(&mixed).is_ok());
    }

    #[test]
    fn parsing_continues_after_a_nesting_error() {
        let source = format!("let a = {}1{};\nlet b = ;", "(".repeat(500), ")".repeat(500));
        let errors = parse_submission(&source).unwrap_err();
        assert_eq!(errors.errors.len(), 2);
        assert_eq!(errors.errors[0].kind, SyntaxErrorKind::TooDeep);
        assert_eq!(errors.errors[1].kind, SyntaxErrorKind::Grammar);
    }
}
