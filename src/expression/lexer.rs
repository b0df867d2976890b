//! 表达式词法分析器

use crate::core::error::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    /// 字段路径，例如 `amt` 或 `customer.region`
    Ident(String),
    /// `$name`
    Variable(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    Comma,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    index: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            index: 0,
        }
    }

    /// 把整个输入切分为词法单元，末尾总有一个 `Eof`
    pub fn tokenize(mut self) -> Result<Vec<Token>, ExpressionError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).map(|(_, c)| *c)
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.index + 1).map(|(_, c)| *c)
    }

    fn position(&self) -> usize {
        self.chars
            .get(self.index)
            .map(|(pos, _)| *pos)
            .unwrap_or(self.input.len())
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.index += 1;
        c
    }

    fn next_token(&mut self) -> Result<Token, ExpressionError> {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.index += 1;
        }

        let position = self.position();
        let c = match self.bump() {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    position,
                })
            }
        };

        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '=' => {
                if self.peek() == Some('=') {
                    self.index += 1;
                }
                TokenKind::Eq
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.index += 1;
                    TokenKind::NotEq
                } else {
                    TokenKind::Not
                }
            }
            '<' => match self.peek() {
                Some('=') => {
                    self.index += 1;
                    TokenKind::LtEq
                }
                Some('>') => {
                    self.index += 1;
                    TokenKind::NotEq
                }
                _ => TokenKind::Lt,
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.index += 1;
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '&' if self.peek() == Some('&') => {
                self.index += 1;
                TokenKind::And
            }
            '|' if self.peek() == Some('|') => {
                self.index += 1;
                TokenKind::Or
            }
            '\'' | '"' => self.read_string(c, position)?,
            '$' => {
                let name = self.read_word();
                if name.is_empty() {
                    return Err(ExpressionError::syntax_error("`$` 后缺少变量名")
                        .with_position(position));
                }
                TokenKind::Variable(name)
            }
            c if c.is_ascii_digit() => self.read_number(c, position)?,
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                word.push_str(&self.read_word());
                self.read_path(word)
            }
            other => {
                return Err(
                    ExpressionError::syntax_error(format!("意外的字符 {:?}", other))
                        .with_position(position),
                )
            }
        };

        Ok(Token { kind, position })
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.index += 1;
            } else {
                break;
            }
        }
        word
    }

    /// 读取 `a.b.0` 形式的路径并识别关键字
    fn read_path(&mut self, mut word: String) -> TokenKind {
        while self.peek() == Some('.')
            && matches!(self.peek_next(), Some(c) if c.is_alphanumeric() || c == '_')
        {
            self.index += 1;
            word.push('.');
            word.push_str(&self.read_word());
        }

        match word.to_ascii_lowercase().as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            _ => TokenKind::Ident(word),
        }
    }

    fn read_number(&mut self, first: char, position: usize) -> Result<TokenKind, ExpressionError> {
        let mut text = String::from(first);
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.index += 1;
            } else if c == '.' && !is_float && matches!(self.peek_next(), Some(d) if d.is_ascii_digit())
            {
                is_float = true;
                text.push(c);
                self.index += 1;
            } else {
                break;
            }
        }

        if is_float {
            text.parse::<f64>().map(TokenKind::Float).map_err(|_| {
                ExpressionError::syntax_error(format!("无效的数字 {}", text)).with_position(position)
            })
        } else {
            text.parse::<i64>().map(TokenKind::Int).map_err(|_| {
                ExpressionError::syntax_error(format!("整数超出范围 {}", text))
                    .with_position(position)
            })
        }
    }

    fn read_string(&mut self, quote: char, position: usize) -> Result<TokenKind, ExpressionError> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(c) => text.push(c),
                    None => break,
                },
                Some(c) if c == quote => return Ok(TokenKind::Str(text)),
                Some(c) => text.push(c),
                None => break,
            }
        }
        Err(ExpressionError::syntax_error("字符串未闭合").with_position(position))
    }
}
