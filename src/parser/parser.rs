//! Recursive-descent parsing of the single-function source language.
use crate::{
    ast::*,
    lexer::tokens::{Keyword, Symbol, Token, TokenKind},
    span::Span,
};

use super::error::*;

type ParseResult<T> = Result<T, ParseError>;

/// Parse a token stream into a [`Program`]. Fails fast on the first
/// syntax error; recovery is left to the caller.
pub fn parse(tokens: &[Token]) -> ParseResult<Program> {
    Parser::new(tokens).parse_program()
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    /// `program := function`
    fn parse_program(mut self) -> ParseResult<Program> {
        let function = self.parse_function()?;
        Ok(Program { function })
    }

    /// `function := "int" "main" "(" ")" block`
    fn parse_function(&mut self) -> ParseResult<Function> {
        self.expect_keyword(Keyword::Int)?;
        self.expect_keyword(Keyword::Main)?;
        self.expect_symbol(Symbol::OpenParen)?;
        self.expect_symbol(Symbol::CloseParen)?;
        let body = self.parse_block()?;

        Ok(Function {
            name: "main".to_string(),
            body,
        })
    }

    /// `block := "{" statement* "}"`
    fn parse_block(&mut self) -> ParseResult<Block> {
        self.expect_symbol(Symbol::OpenBrace)?;
        let mut block = Block::new();

        while !self.next_is_symbol(Symbol::CloseBrace) {
            block.statements.push(self.parse_statement()?);
        }
        self.expect_symbol(Symbol::CloseBrace)?;

        Ok(block)
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let start = self.current_span();
        let stmt_kind = match self.peek_kind().cloned() {
            Some(TokenKind::Keyword(Keyword::Int)) => StmtKind::Decl(self.parse_decl()?),
            Some(TokenKind::Keyword(Keyword::Float)) => StmtKind::Decl(self.parse_decl()?),
            Some(TokenKind::Keyword(Keyword::If)) => StmtKind::If(self.parse_if()?),
            Some(TokenKind::Keyword(Keyword::Return)) => StmtKind::Return(self.parse_return()?),
            Some(TokenKind::Identifier(_)) => StmtKind::Assign(self.parse_assign()?),
            Some(TokenKind::Symbol(Symbol::OpenBrace)) => StmtKind::Block(self.parse_block()?),
            Some(kind) => {
                return Err(ParseError::new(
                    Reason::UnexpectedStatement(kind.to_string()),
                    start,
                ))
            }
            None => return Err(ParseError::new(Reason::UnexpectedEndOfInput, start)),
        };

        Ok(Statement {
            stmt_kind,
            span: start.to(self.previous_span()),
        })
    }

    /// `decl := type identifier ("=" expr)? ";"`
    fn parse_decl(&mut self) -> ParseResult<Decl> {
        let type_spec = match self.advance().map(|t| &t.kind) {
            Some(TokenKind::Keyword(Keyword::Int)) => TypeSpec::Int,
            Some(TokenKind::Keyword(Keyword::Float)) => TypeSpec::Float,
            _ => unreachable!("checked by parse_statement"),
        };
        let name = self.expect_identifier()?;

        let initializer = if self.recognise_symbol(Symbol::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect_symbol(Symbol::Semicolon)?;

        Ok(Decl {
            type_spec,
            name,
            initializer,
        })
    }

    /// `assign := identifier assign-op expr ";"`
    fn parse_assign(&mut self) -> ParseResult<Assign> {
        let target = self.expect_identifier()?;
        let op = match self.peek_kind() {
            Some(TokenKind::Symbol(Symbol::Assign)) => AssignOp::Assign,
            Some(TokenKind::Symbol(Symbol::PlusAssign)) => AssignOp::AddAssign,
            Some(TokenKind::Symbol(Symbol::MinusAssign)) => AssignOp::SubAssign,
            Some(TokenKind::Symbol(Symbol::AsteriskAssign)) => AssignOp::MulAssign,
            Some(TokenKind::Symbol(Symbol::SlashAssign)) => AssignOp::DivAssign,
            _ => return Err(self.expectation_error("an assignment operator")),
        };
        self.advance();

        let value = self.parse_expr()?;
        self.expect_symbol(Symbol::Semicolon)?;

        Ok(Assign { target, op, value })
    }

    /// `if := "if" "(" expr ")" stmt ("else" stmt)?`
    fn parse_if(&mut self) -> ParseResult<If> {
        self.expect_keyword(Keyword::If)?;
        self.expect_symbol(Symbol::OpenParen)?;
        let condition = self.parse_expr()?;
        self.expect_symbol(Symbol::CloseParen)?;

        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.recognise_keyword(Keyword::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(If {
            condition,
            then_branch,
            else_branch,
        })
    }

    /// `return := "return" expr ";"`
    fn parse_return(&mut self) -> ParseResult<Return> {
        self.expect_keyword(Keyword::Return)?;
        let value = self.parse_expr()?;
        self.expect_symbol(Symbol::Semicolon)?;

        Ok(Return { value })
    }

    /// `expr := additive (rel-op additive)*`
    fn parse_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_additive()?;

        while let Some(op) = self.peek_binop(&[
            (Symbol::Lt, BinOp::Lt),
            (Symbol::Lte, BinOp::Lte),
            (Symbol::Gt, BinOp::Gt),
            (Symbol::Gte, BinOp::Gte),
            (Symbol::Eq, BinOp::Eq),
            (Symbol::Neq, BinOp::Neq),
        ]) {
            self.advance();
            let right = self.parse_additive()?;
            left = combine(op, left, right);
        }
        Ok(left)
    }

    /// `additive := term (("+" | "-") term)*`
    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_term()?;

        while let Some(op) =
            self.peek_binop(&[(Symbol::Plus, BinOp::Add), (Symbol::Minus, BinOp::Sub)])
        {
            self.advance();
            let right = self.parse_term()?;
            left = combine(op, left, right);
        }
        Ok(left)
    }

    /// `term := factor (("*" | "/") factor)*`
    fn parse_term(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_factor()?;

        while let Some(op) =
            self.peek_binop(&[(Symbol::Asterisk, BinOp::Mul), (Symbol::Slash, BinOp::Div)])
        {
            self.advance();
            let right = self.parse_factor()?;
            left = combine(op, left, right);
        }
        Ok(left)
    }

    /// `factor := identifier | number | "(" expr ")"`
    fn parse_factor(&mut self) -> ParseResult<Expr> {
        let span = self.current_span();
        match self.peek_kind().cloned() {
            Some(TokenKind::Identifier(id)) => {
                self.advance();
                Ok(Expr::new(ExprKind::Var(id), span))
            }
            Some(TokenKind::Number(num)) => {
                self.advance();
                Ok(Expr::new(ExprKind::Number(num), span))
            }
            Some(TokenKind::Symbol(Symbol::OpenParen)) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_symbol(Symbol::CloseParen)?;
                Ok(inner)
            }
            Some(kind) => Err(ParseError::new(
                Reason::UnexpectedExpression(kind.to_string()),
                span,
            )),
            None => Err(ParseError::new(Reason::UnexpectedEndOfInput, span)),
        }
    }

    fn peek_binop(&self, table: &[(Symbol, BinOp)]) -> Option<BinOp> {
        let symbol = match self.peek_kind() {
            Some(TokenKind::Symbol(symbol)) => *symbol,
            _ => return None,
        };
        table
            .iter()
            .find(|(candidate, _)| *candidate == symbol)
            .map(|(_, op)| *op)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|token| &token.kind)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Consume the next token if it is the given symbol.
    fn recognise_symbol(&mut self, symbol: Symbol) -> bool {
        if self.next_is_symbol(symbol) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn recognise_keyword(&mut self, keyword: Keyword) -> bool {
        if self.peek_kind() == Some(&TokenKind::Keyword(keyword)) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn next_is_symbol(&self, symbol: Symbol) -> bool {
        self.peek_kind() == Some(&TokenKind::Symbol(symbol))
    }

    fn expect_symbol(&mut self, symbol: Symbol) -> ParseResult<()> {
        if self.recognise_symbol(symbol) {
            Ok(())
        } else {
            Err(self.expectation_error(&format!("'{}'", symbol)))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> ParseResult<()> {
        if self.recognise_keyword(keyword) {
            Ok(())
        } else {
            Err(self.expectation_error(&format!("'{}'", keyword)))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        match self.peek_kind().cloned() {
            Some(TokenKind::Identifier(id)) => {
                self.advance();
                Ok(id)
            }
            _ => Err(self.expectation_error("an identifier")),
        }
    }

    fn expectation_error(&self, expected: &str) -> ParseError {
        let (found, span) = match self.tokens.get(self.pos) {
            Some(token) => (token.kind.to_string(), token.source),
            None => ("end of input".to_string(), self.previous_span()),
        };
        ParseError::new(
            Reason::Expected {
                expected: expected.to_string(),
                found,
            },
            span,
        )
    }

    /// The span of the next token, or of the last one at end of input.
    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|token| token.source)
            .unwrap_or_else(|| self.previous_span())
    }

    fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|prev| self.tokens.get(prev))
            .map(|token| token.source)
            .unwrap_or_else(Span::zero)
    }
}

fn combine(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.to(rhs.span);
    Expr::new(ExprKind::Binary(Box::new(BinExpr { op, lhs, rhs })), span)
}
