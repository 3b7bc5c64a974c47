use crate::language::{
    ast::*,
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    span::Span,
    token::{Token, TokenKind},
    types::{Type, TypeAnnotation},
};
use std::rc::Rc;

pub fn parse_module(path: &str, source: &str) -> Result<Module, SyntaxErrors> {
    let tokens = lex_tokens(source)?;
    Parser::new(tokens).parse(path, source.len())
}

/// Parse a standalone expression, e.g. a value supplied on the command line.
pub fn parse_expression_source(source: &str) -> Result<Expr, SyntaxErrors> {
    let tokens = lex_tokens(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser
        .parse_expression()
        .map_err(|err| SyntaxErrors::new(vec![err]))?;
    if !parser.is_eof() {
        return Err(SyntaxErrors::new(vec![
            parser.error_here("Unexpected input after expression")
        ]));
    }
    Ok(expr)
}

fn lex_tokens(source: &str) -> Result<Vec<Token>, SyntaxErrors> {
    lex(source).map_err(|errors| {
        SyntaxErrors::new(
            errors
                .into_iter()
                .map(|err| SyntaxError::new(err.message, err.span))
                .collect(),
        )
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    fn parse(mut self, path: &str, source_len: usize) -> Result<Module, SyntaxErrors> {
        let mut statements = Vec::new();

        while !self.is_eof() {
            if self.matches(TokenKind::Semi) {
                continue;
            }
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.report(err);
                    self.synchronize_statement();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(Module {
                path: path.to_string(),
                statements,
                span: Span::new(0, source_len),
            })
        } else {
            Err(SyntaxErrors::new(self.errors))
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, SyntaxError> {
        let start = self.current_span_start();
        let stmt = if self.check(TokenKind::Import) {
            Statement::Import(self.parse_import(false, start)?)
        } else if self.matches(TokenKind::Export) {
            if self.check(TokenKind::Import) {
                Statement::Import(self.parse_import(true, start)?)
            } else {
                Statement::Let(self.parse_let(true, start)?)
            }
        } else if matches!(self.peek_kind(), Some(TokenKind::Identifier(_)))
            && self.peek_kind_n(1) == Some(TokenKind::Eq)
        {
            Statement::Let(self.parse_let(false, start)?)
        } else {
            let expr = self.parse_expression()?;
            let span = expr.span();
            Statement::Expr(ExprStmt { expr, span })
        };
        self.expect_statement_end()?;
        Ok(stmt)
    }

    fn parse_import(&mut self, exported: bool, start: usize) -> Result<ImportStmt, SyntaxError> {
        self.expect(TokenKind::Import)?;
        if let Some(TokenKind::String(_)) = self.peek_kind() {
            let (path, path_span) = self.expect_string_literal("Expected import path string")?;
            let alias = if self.matches(TokenKind::As) {
                Some(self.expect_identifier("Expected alias after `as`")?)
            } else {
                None
            };
            let end = self.previous_end(path_span.end);
            return Ok(ImportStmt {
                exported,
                items: ImportItems::Module { alias },
                path,
                path_span,
                span: Span::new(start, end),
            });
        }

        let mut items = Vec::new();
        loop {
            items.push(self.parse_import_item()?);
            if self.matches(TokenKind::Comma) {
                continue;
            }
            break;
        }
        self.expect(TokenKind::From)?;
        let (path, path_span) = self.expect_string_literal("Expected import path string")?;
        Ok(ImportStmt {
            exported,
            items: ImportItems::List(items),
            path,
            path_span,
            span: Span::new(start, path_span.end),
        })
    }

    fn parse_import_item(&mut self) -> Result<ImportItem, SyntaxError> {
        if self.matches(TokenKind::Star) {
            let span = self.previous_span().unwrap_or_default();
            return Ok(ImportItem::Glob(span));
        }
        if self.matches(TokenKind::SelfKw) {
            let span = self.previous_span().unwrap_or_default();
            let alias = self.parse_optional_alias()?;
            return Ok(ImportItem::SelfModule { span, alias });
        }
        let name = self.expect_identifier("Expected imported name, `self` or `*`")?;
        let alias = self.parse_optional_alias()?;
        Ok(ImportItem::Name { name, alias })
    }

    fn parse_optional_alias(&mut self) -> Result<Option<Identifier>, SyntaxError> {
        if self.matches(TokenKind::As) {
            Ok(Some(self.expect_identifier("Expected alias after `as`")?))
        } else {
            Ok(None)
        }
    }

    fn parse_let(&mut self, exported: bool, start: usize) -> Result<LetStmt, SyntaxError> {
        let name = self.expect_identifier("Expected binding name")?;
        self.expect(TokenKind::Eq)?;
        let value = self.parse_expression()?;
        let end = value.span().end;
        Ok(LetStmt {
            exported,
            name,
            value,
            span: Span::new(start, end),
        })
    }

    fn parse_block(&mut self) -> Result<Block, SyntaxError> {
        let start = self.expect(TokenKind::LBrace)?.span.start;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            if self.matches(TokenKind::Semi) {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        let end = self.expect(TokenKind::RBrace)?.span.end;
        Ok(Block {
            statements,
            span: Span::new(start, end),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        let pipeline = self.parse_pipeline()?;
        if pipeline.stages.len() == 1 && pipeline.stages[0].tag.is_none() {
            if let Some(stage) = pipeline.stages.into_iter().next() {
                if let StageKind::Expr(expr) = stage.kind {
                    return Ok(expr);
                }
            }
            return Err(self.error_here("Operator stage without a receiver"));
        }
        Ok(Expr::Pipeline(pipeline))
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline, SyntaxError> {
        self.parse_chain(true)
    }

    /// A chain whose first stage may be an operator when it continues an
    /// outer pipeline, as a `for` body does.
    fn parse_chain(&mut self, first: bool) -> Result<Pipeline, SyntaxError> {
        let mut stages = vec![self.parse_stage(first)?];
        loop {
            // A `for` body consumes the rest of the chain.
            if matches!(
                stages.last().map(|s| &s.kind),
                Some(StageKind::Expr(Expr::For(_)))
            ) {
                break;
            }
            if !self.matches(TokenKind::PipeGt) {
                break;
            }
            stages.push(self.parse_stage(false)?);
        }
        let span = stages[0].span.union(stages[stages.len() - 1].span);
        Ok(Pipeline { stages, span })
    }

    fn parse_stage(&mut self, first: bool) -> Result<Stage, SyntaxError> {
        let start = self.current_span_start();
        let kind = match self.current_binary_op() {
            Some((op, prec)) if !first => {
                self.advance();
                let operand = self.parse_binary(prec + 1)?;
                StageKind::Operator { op, operand }
            }
            _ if self.check(TokenKind::For) => StageKind::Expr(self.parse_for()?),
            _ => StageKind::Expr(self.parse_binary(0)?),
        };
        let is_for = matches!(kind, StageKind::Expr(Expr::For(_)));
        let tag = if !is_for && self.matches(TokenKind::As) {
            Some(self.expect_identifier("Expected tag name after `as`")?)
        } else {
            None
        };
        let end = self.previous_end(start);
        Ok(Stage {
            kind,
            tag,
            span: Span::new(start, end),
        })
    }

    fn parse_for(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(TokenKind::For)?.span.start;
        let sequence = self.parse_binary(0)?;
        self.expect(TokenKind::As)?;
        let binding = self.expect_identifier("Expected loop variable after `as`")?;
        self.expect(TokenKind::PipeGt)?;
        let body = self.parse_chain(false)?;
        let span = Span::new(start, body.span.end);
        Ok(Expr::For(Box::new(ForExpr {
            sequence,
            binding,
            body,
            span,
        })))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary()?;

        loop {
            let (op, prec) = match self.current_binary_op() {
                Some(info) => info,
                None => break,
            };
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
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_span_start();
        let op = if self.matches(TokenKind::Minus) {
            UnaryOp::Neg
        } else if self.matches(TokenKind::Bang) {
            UnaryOp::Not
        } else {
            return self.parse_postfix();
        };
        let expr = self.parse_unary()?;
        let span = Span::new(start, expr.span().end);
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
            span,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_primary()?;
        loop {
            // An opening bracket on a fresh line starts a new statement.
            if self.current_on_new_line() {
                break;
            }
            if self.matches(TokenKind::LParen) {
                let args = self.parse_arguments()?;
                let end = self.expect(TokenKind::RParen)?.span.end;
                let span = Span::new(expr.span().start, end);
                expr = Expr::Call(CallExpr {
                    callee: Box::new(expr),
                    args,
                    span,
                });
                continue;
            }
            if self.matches(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                let end = self.expect(TokenKind::RBracket)?.span.end;
                let span = Span::new(expr.span().start, end);
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                    span,
                };
                continue;
            }
            break;
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>, SyntaxError> {
        let mut args = Vec::new();
        if self.check(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            let name = if matches!(self.peek_kind(), Some(TokenKind::Identifier(_)))
                && self.peek_kind_n(1) == Some(TokenKind::Eq)
            {
                let name = self.expect_identifier("Expected argument name")?;
                self.expect(TokenKind::Eq)?;
                Some(name)
            } else {
                None
            };
            let value = self.parse_expression()?;
            args.push(Argument { name, value });
            if self.matches(TokenKind::Comma) {
                if self.check(TokenKind::RParen) {
                    break;
                }
                continue;
            }
            break;
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        if self.check(TokenKind::LBrace) {
            let block = self.parse_block()?;
            return Ok(Expr::Block(Box::new(block)));
        }
        if self.matches(TokenKind::If) {
            let start = self.previous_span().map(|s| s.start).unwrap_or_default();
            return self.parse_if(start).map(|expr| Expr::If(Box::new(expr)));
        }

        match self.peek_kind() {
            Some(TokenKind::Identifier(_)) => self.parse_identifier_expression(),
            Some(TokenKind::Number(value)) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Number(value, span)))
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
            Some(TokenKind::LParen) if self.is_function_start() => self.parse_function(),
            Some(TokenKind::LParen) => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            Some(TokenKind::LBracket) => self.parse_array_or_range(),
            _ => Err(self.error_here("Unexpected token in expression")),
        }
    }

    fn parse_identifier_expression(&mut self) -> Result<Expr, SyntaxError> {
        let ident = self.expect_identifier("Expected identifier")?;
        if !self.check(TokenKind::ColonColon) {
            return Ok(Expr::Identifier(ident));
        }
        let start = ident.span.start;
        let mut segments = vec![ident];
        while self.matches(TokenKind::ColonColon) {
            segments.push(self.expect_identifier("Expected name after `::`")?);
        }
        let end = segments.last().map(|s| s.span.end).unwrap_or(start);
        Ok(Expr::Path(PathExpr {
            segments,
            span: Span::new(start, end),
        }))
    }

    fn parse_array_or_range(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(TokenKind::LBracket)?.span.start;
        if self.check(TokenKind::RBracket) {
            let end = self.advance().span.end;
            return Ok(Expr::Array(Vec::new(), Span::new(start, end)));
        }
        let first = self.parse_expression()?;
        let inclusive = if self.matches(TokenKind::DotDot) {
            Some(false)
        } else if self.matches(TokenKind::DotDotEq) {
            Some(true)
        } else {
            None
        };
        if let Some(inclusive) = inclusive {
            let end_expr = self.parse_expression()?;
            let end = self.expect(TokenKind::RBracket)?.span.end;
            return Ok(Expr::Range(RangeExpr {
                start: Box::new(first),
                end: Box::new(end_expr),
                inclusive,
                span: Span::new(start, end),
            }));
        }
        let mut elements = vec![first];
        while self.matches(TokenKind::Comma) {
            if self.check(TokenKind::RBracket) {
                break;
            }
            elements.push(self.parse_expression()?);
        }
        let end = self.expect(TokenKind::RBracket)?.span.end;
        Ok(Expr::Array(elements, Span::new(start, end)))
    }

    fn parse_if(&mut self, start: usize) -> Result<IfExpr, SyntaxError> {
        let condition = self.parse_binary(0)?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.matches(TokenKind::Else) {
            if self.matches(TokenKind::If) {
                let nested_start = self.previous_span().map(|s| s.start).unwrap_or(start);
                Some(ElseBranch::If(Box::new(self.parse_if(nested_start)?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };
        let end = self.previous_end(then_branch.span.end);
        Ok(IfExpr {
            condition,
            then_branch,
            else_branch,
            span: Span::new(start, end),
        })
    }

    /// Looks past the matching `)` for `=>` or `->`.
    fn is_function_start(&self) -> bool {
        let mut depth = 0usize;
        for (offset, token) in self.tokens[self.pos..].iter().enumerate() {
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(
                            self.peek_kind_n(offset + 1),
                            Some(TokenKind::FatArrow) | Some(TokenKind::Arrow)
                        );
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
        }
        false
    }

    fn parse_function(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(TokenKind::LParen)?.span.start;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.parse_param()?);
                if self.matches(TokenKind::Comma) {
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        let returns = if self.matches(TokenKind::Arrow) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        self.expect(TokenKind::FatArrow)?;
        let body = self.parse_expression()?;
        let span = Span::new(start, body.span().end);
        Ok(Expr::Function(Rc::new(FunctionExpr {
            params,
            returns,
            body,
            span,
        })))
    }

    fn parse_param(&mut self) -> Result<Param, SyntaxError> {
        let name = self.expect_identifier("Expected parameter name")?;
        let ty = if self.matches(TokenKind::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let default = if self.matches(TokenKind::Eq) {
            Some(self.parse_binary(0)?)
        } else {
            None
        };
        let end = self.previous_end(name.span.end);
        let span = Span::new(name.span.start, end);
        Ok(Param {
            name,
            ty,
            default,
            span,
        })
    }

    fn parse_type_annotation(&mut self) -> Result<TypeAnnotation, SyntaxError> {
        let start = self.current_span_start();
        let ty = self.parse_type()?;
        let end = self.previous_end(start);
        Ok(TypeAnnotation {
            ty,
            span: Span::new(start, end),
        })
    }

    fn parse_type(&mut self) -> Result<Type, SyntaxError> {
        if self.matches(TokenKind::LBracket) {
            let inner = self.parse_type()?;
            self.expect(TokenKind::RBracket)?;
            return Ok(Type::array_of(inner));
        }
        let ident = self.expect_identifier("Expected type")?;
        Ok(Type::from_name(&ident.name))
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

    fn expect_statement_end(&mut self) -> Result<(), SyntaxError> {
        if self.matches(TokenKind::Semi) {
            return Ok(());
        }
        match self.tokens.get(self.pos) {
            Some(token)
                if token.line_start || matches!(token.kind, TokenKind::RBrace | TokenKind::Eof) =>
            {
                Ok(())
            }
            None => Ok(()),
            _ => Err(self
                .error_here("Expected a new line or `;` after statement")
                .with_help("put each statement on its own line")),
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

    fn expect_string_literal(&mut self, msg: &str) -> Result<(String, Span), SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::String(value)) => {
                let span = self.advance().span;
                Ok((value, span))
            }
            _ => Err(self.error_here(msg)),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token, SyntaxError> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else {
            Err(self.error_here(&format!("Expected {}", describe(&kind))))
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

    fn peek_kind_n(&self, n: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + n).map(|t| t.kind.clone())
    }

    fn current_on_new_line(&self) -> bool {
        self.tokens
            .get(self.pos)
            .map(|t| t.line_start)
            .unwrap_or(false)
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

    fn previous_end(&self, fallback: usize) -> usize {
        self.previous_span().map(|s| s.end).unwrap_or(fallback)
    }

    fn previous_span(&self) -> Option<Span> {
        if self.pos == 0 {
            None
        } else {
            self.tokens.get(self.pos - 1).map(|t| t.span)
        }
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

    fn report(&mut self, err: SyntaxError) {
        self.errors.push(err);
    }

    fn synchronize_statement(&mut self) {
        if !self.is_eof() {
            self.advance();
        }
        while !self.is_eof() && !self.current_on_new_line() {
            self.advance();
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    let text = match kind {
        TokenKind::PipeGt => "`|>`",
        TokenKind::FatArrow => "`=>`",
        TokenKind::Eq => "`=`",
        TokenKind::As => "`as`",
        TokenKind::From => "`from`",
        TokenKind::Import => "`import`",
        TokenKind::For => "`for`",
        TokenKind::LParen => "`(`",
        TokenKind::RParen => "`)`",
        TokenKind::LBrace => "`{`",
        TokenKind::RBrace => "`}`",
        TokenKind::LBracket => "`[`",
        TokenKind::RBracket => "`]`",
        other => return format!("{other:?}"),
    };
    text.to_string()
}
