//! Parser: recursive descent parser for the script language
//!
//! Consumes tokens from the lexer and produces the statement list the
//! evaluator walks. Statements are self-delimiting; semicolons are accepted
//! as optional separators.

use crate::interp::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use crate::interp::lexer::{Lexer, Token, TokenKind};
use crate::interp::ScriptError;
use std::rc::Rc;

/// Nesting bound that keeps hostile input from overflowing the parse stack
const MAX_NESTING: usize = 100;

/// Parser for the script language
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Parse source text into a program
    pub fn parse(input: &str) -> Result<Vec<Stmt>, ScriptError> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Self {
            tokens,
            pos: 0,
            depth: 0,
        };
        parser.parse_program()
    }

    /// Run `parse` one nesting level down. Every self-recursive production
    /// goes through here so total parse depth stays bounded.
    fn descend<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ScriptError>,
    ) -> Result<T, ScriptError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            let line = self.peek().line;
            self.depth -= 1;
            return Err(ScriptError::parse(line, "nesting too deep"));
        }
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_program(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        let mut stmts = Vec::new();
        while !self.check(TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.descend(|p| {
            p.expect(TokenKind::LBrace)?;
            let mut stmts = Vec::new();
            while !p.check(TokenKind::RBrace) && !p.check(TokenKind::Eof) {
                stmts.push(p.parse_stmt()?);
            }
            p.expect(TokenKind::RBrace)?;
            Ok(stmts)
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ScriptError> {
        let stmt = match self.peek_kind() {
            TokenKind::Fn => self.parse_fn_def()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Return => self.parse_return()?,
            TokenKind::Break => {
                let line = self.advance().line;
                Stmt::Break { line }
            }
            TokenKind::Continue => {
                let line = self.advance().line;
                Stmt::Continue { line }
            }
            _ => self.parse_simple_stmt()?,
        };
        // Optional separator after any statement.
        while self.check(TokenKind::Semicolon) {
            self.advance();
        }
        Ok(stmt)
    }

    /// Assignment or bare expression, disambiguated after parsing the
    /// left-hand side.
    fn parse_simple_stmt(&mut self) -> Result<Stmt, ScriptError> {
        let expr = self.parse_expr()?;

        if self.check(TokenKind::Assign) {
            let line = self.advance().line;
            let value = self.parse_expr()?;
            return match expr {
                Expr::Var { name, .. } => Ok(Stmt::Assign { name, value }),
                Expr::Index { target, index, line } => Ok(Stmt::AssignIndex {
                    target: *target,
                    index: *index,
                    value,
                    line,
                }),
                _ => Err(ScriptError::parse(line, "invalid assignment target")),
            };
        }

        Ok(Stmt::Expr(expr))
    }

    fn parse_fn_def(&mut self) -> Result<Stmt, ScriptError> {
        self.expect(TokenKind::Fn)?;
        let name = self.expect(TokenKind::Ident)?.text.clone();
        self.expect(TokenKind::LParen)?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.expect(TokenKind::Ident)?.text.clone());
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        let body = self.parse_block()?;
        Ok(Stmt::FnDef {
            name,
            params,
            body: Rc::new(body),
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ScriptError> {
        self.expect(TokenKind::If)?;
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;

        let else_block = if self.check(TokenKind::Else) {
            self.advance();
            if self.check(TokenKind::If) {
                // `else if` chains nest as a one-statement else block.
                Some(vec![self.descend(Self::parse_if)?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then_block,
            else_block,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, ScriptError> {
        self.expect(TokenKind::While)?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_for(&mut self) -> Result<Stmt, ScriptError> {
        let line = self.expect(TokenKind::For)?.line;
        let var = self.expect(TokenKind::Ident)?.text.clone();
        self.expect(TokenKind::In)?;
        let iterable = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::For {
            var,
            iterable,
            body,
            line,
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, ScriptError> {
        let line = self.expect(TokenKind::Return)?.line;
        let value = if self.check(TokenKind::Semicolon)
            || self.check(TokenKind::RBrace)
            || self.check(TokenKind::Eof)
        {
            None
        } else {
            Some(self.parse_expr()?)
        };
        Ok(Stmt::Return { value, line })
    }

    fn parse_expr(&mut self) -> Result<Expr, ScriptError> {
        self.descend(Self::parse_or)
    }

    fn parse_or(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_and()?;
        while self.check(TokenKind::Or) {
            let line = self.advance().line;
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_not()?;
        while self.check(TokenKind::And) {
            let line = self.advance().line;
            let right = self.parse_not()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ScriptError> {
        if self.check(TokenKind::Not) {
            let line = self.advance().line;
            let operand = self.descend(Self::parse_not)?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                line,
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ScriptError> {
        if self.check(TokenKind::Minus) {
            let line = self.advance().line;
            let operand = self.descend(Self::parse_unary)?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
                line,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    let line = self.advance().line;
                    let mut args = Vec::new();
                    if !self.check(TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.check(TokenKind::Comma) {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        line,
                    };
                }
                TokenKind::LBracket => {
                    let line = self.advance().line;
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                        line,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ScriptError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Int => {
                self.advance();
                let value = token.text.parse::<i64>().map_err(|_| {
                    ScriptError::parse(token.line, "integer literal too large")
                })?;
                Ok(Expr::Int(value))
            }
            TokenKind::Float => {
                self.advance();
                let value = token.text.parse::<f64>().map_err(|_| {
                    ScriptError::parse(token.line, "malformed number literal")
                })?;
                Ok(Expr::Float(value))
            }
            TokenKind::Str => {
                self.advance();
                Ok(Expr::Str(token.text))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::Nil)
            }
            TokenKind::Ident => {
                self.advance();
                Ok(Expr::Var {
                    name: token.text,
                    line: token.line,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                let line = self.advance().line;
                let mut items = Vec::new();
                if !self.check(TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if self.check(TokenKind::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::List { items, line })
            }
            other => Err(ScriptError::parse(
                token.line,
                format!("unexpected token: {}", other),
            )),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token, ScriptError> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            let token = self.peek();
            Err(ScriptError::parse(
                token.line,
                format!("expected {}, found {}", kind, token.kind),
            ))
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_call_statement() {
        let program = Parser::parse("print('hi')").unwrap();
        assert_eq!(program.len(), 1);
        assert!(matches!(&program[0], Stmt::Expr(Expr::Call { .. })));
    }

    #[test]
    fn test_parse_assignment() {
        let program = Parser::parse("x = 1 + 2").unwrap();
        match &program[0] {
            Stmt::Assign { name, .. } => assert_eq!(name, "x"),
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_index_assignment() {
        let program = Parser::parse("xs[0] = 5").unwrap();
        assert!(matches!(&program[0], Stmt::AssignIndex { .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(Parser::parse("1 = 2").is_err());
        assert!(Parser::parse("f() = 2").is_err());
    }

    #[test]
    fn test_parse_if_else_chain() {
        let program = Parser::parse("if a { b() } else if c { d() } else { e() }").unwrap();
        match &program[0] {
            Stmt::If { else_block, .. } => {
                let else_block = else_block.as_ref().unwrap();
                assert!(matches!(&else_block[0], Stmt::If { .. }));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_while_and_for() {
        let program = Parser::parse("while x < 3 { x = x + 1 }\nfor i in range(3) { print(i) }")
            .unwrap();
        assert!(matches!(&program[0], Stmt::While { .. }));
        assert!(matches!(&program[1], Stmt::For { .. }));
    }

    #[test]
    fn test_parse_fn_def() {
        let program = Parser::parse("fn add(a, b) { return a + b }").unwrap();
        match &program[0] {
            Stmt::FnDef { name, params, .. } => {
                assert_eq!(name, "add");
                assert_eq!(params, &["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected fn def, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_return() {
        let program = Parser::parse("fn f() { return }").unwrap();
        match &program[0] {
            Stmt::FnDef { body, .. } => {
                assert!(matches!(&body[0], Stmt::Return { value: None, .. }));
            }
            other => panic!("expected fn def, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses the multiplication as the right operand.
        let program = Parser::parse("x = 1 + 2 * 3").unwrap();
        match &program[0] {
            Stmt::Assign { value, .. } => match value {
                Expr::Binary { op: BinaryOp::Add, right, .. } => {
                    assert!(matches!(**right, Expr::Binary { op: BinaryOp::Mul, .. }));
                }
                other => panic!("expected addition at the top, got {:?}", other),
            },
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_unexpected_token_reports_line() {
        let err = Parser::parse("x = 1\ny = )").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_nesting_bound() {
        let source = format!("x = {}1{}", "(".repeat(500), ")".repeat(500));
        let err = Parser::parse(&source).unwrap_err();
        assert!(err.message.contains("nesting too deep"));
    }

    #[test]
    fn test_unary_chain_bounded() {
        let source = format!("x = {}1", "-".repeat(100_000));
        let err = Parser::parse(&source).unwrap_err();
        assert!(err.message.contains("nesting too deep"));
    }

    #[test]
    fn test_not_chain_bounded() {
        let source = format!("{}true", "not ".repeat(100_000));
        let err = Parser::parse(&source).unwrap_err();
        assert!(err.message.contains("nesting too deep"));
    }

    #[test]
    fn test_block_nesting_bounded() {
        let source = "if true { ".repeat(50_000);
        let err = Parser::parse(&source).unwrap_err();
        assert!(err.message.contains("nesting too deep"));
    }

    #[test]
    fn test_else_if_chain_bounded() {
        let mut source = String::from("if a { b() }");
        source.push_str(&" else if a { b() }".repeat(100_000));
        let err = Parser::parse(&source).unwrap_err();
        assert!(err.message.contains("nesting too deep"));
    }

    #[test]
    fn test_semicolons_are_optional_separators() {
        let program = Parser::parse("a = 1; b = 2\nc = 3").unwrap();
        assert_eq!(program.len(), 3);
    }
}
