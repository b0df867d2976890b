//! 表达式语法分析器
//!
//! 使用优先级爬升法解析二元操作符

use super::ast::{BinaryOperator, Expression, UnaryOperator};
use super::lexer::{Lexer, Token, TokenKind};
use crate::core::error::ExpressionError;
use crate::core::Value;

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    /// 解析完整的表达式文本
    pub fn parse(input: &str) -> Result<Expression, ExpressionError> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Parser { tokens, index: 0 };
        let expression = parser.parse_expression(0)?;
        let trailing = parser.peek();
        if trailing.kind != TokenKind::Eof {
            return Err(
                ExpressionError::syntax_error(format!("表达式末尾有多余内容: {:?}", trailing.kind))
                    .with_position(trailing.position),
            );
        }
        Ok(expression)
    }

    fn peek(&self) -> &Token {
        // tokenize 保证最后一个元素是 Eof
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() {
            self.index += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ExpressionError> {
        let token = self.advance();
        if token.kind == kind {
            Ok(())
        } else {
            Err(
                ExpressionError::syntax_error(format!("期望 {}, 实际为 {:?}", what, token.kind))
                    .with_position(token.position),
            )
        }
    }

    fn binary_operator(kind: &TokenKind) -> Option<BinaryOperator> {
        match kind {
            TokenKind::Plus => Some(BinaryOperator::Add),
            TokenKind::Minus => Some(BinaryOperator::Subtract),
            TokenKind::Star => Some(BinaryOperator::Multiply),
            TokenKind::Slash => Some(BinaryOperator::Divide),
            TokenKind::Percent => Some(BinaryOperator::Modulo),
            TokenKind::Eq => Some(BinaryOperator::Equal),
            TokenKind::NotEq => Some(BinaryOperator::NotEqual),
            TokenKind::Lt => Some(BinaryOperator::LessThan),
            TokenKind::LtEq => Some(BinaryOperator::LessThanOrEqual),
            TokenKind::Gt => Some(BinaryOperator::GreaterThan),
            TokenKind::GtEq => Some(BinaryOperator::GreaterThanOrEqual),
            TokenKind::And => Some(BinaryOperator::And),
            TokenKind::Or => Some(BinaryOperator::Or),
            _ => None,
        }
    }

    fn parse_expression(&mut self, min_precedence: u8) -> Result<Expression, ExpressionError> {
        let mut left = self.parse_unary()?;

        while let Some(op) = Self::binary_operator(&self.peek().kind) {
            let precedence = op.precedence();
            if precedence <= min_precedence {
                break;
            }
            self.advance();
            // 所有二元操作符左结合
            let right = self.parse_expression(precedence)?;
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, ExpressionError> {
        match self.peek().kind {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expression::Unary {
                    op: UnaryOperator::Minus,
                    operand: Box::new(operand),
                })
            }
            TokenKind::Not => {
                self.advance();
                // not 的绑定弱于比较运算符：`not a == b` 等价于 `not (a == b)`
                let operand = self.parse_expression(BinaryOperator::And.precedence())?;
                Ok(Expression::Unary {
                    op: UnaryOperator::Not,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, ExpressionError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Int(i) => Ok(Expression::Literal(Value::Int(i))),
            TokenKind::Float(f) => Ok(Expression::Literal(Value::Float(f))),
            TokenKind::Str(s) => Ok(Expression::Literal(Value::String(s))),
            TokenKind::True => Ok(Expression::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expression::Literal(Value::Bool(false))),
            TokenKind::Null => Ok(Expression::Literal(Value::Null)),
            TokenKind::Variable(name) => Ok(Expression::Variable(name)),
            TokenKind::Ident(name) => {
                if self.peek().kind == TokenKind::LParen {
                    self.advance();
                    let args = self.parse_arguments()?;
                    Ok(Expression::Function {
                        name: name.to_ascii_lowercase(),
                        args,
                    })
                } else {
                    Ok(Expression::Field(name))
                }
            }
            TokenKind::LParen => {
                let inner = self.parse_expression(0)?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(
                ExpressionError::syntax_error(format!("意外的词法单元 {:?}", other))
                    .with_position(token.position),
            ),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expression>, ExpressionError> {
        let mut args = Vec::new();
        if self.peek().kind == TokenKind::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression(0)?);
            let token = self.advance();
            match token.kind {
                TokenKind::Comma => continue,
                TokenKind::RParen => return Ok(args),
                other => {
                    return Err(ExpressionError::syntax_error(format!(
                        "函数参数之间期望 ',' 或 ')', 实际为 {:?}",
                        other
                    ))
                    .with_position(token.position))
                }
            }
        }
    }
}
