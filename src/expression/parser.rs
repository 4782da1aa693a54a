use crate::expression::lexer::{tokenize, Spanned, Token};
use crate::expression::EvalError;
use serde_json::Value;

/// Top-level names an expression may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    Input,
    Env,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Upper,
    Lower,
    Trim,
    String,
    Int,
    Float,
    ToJson,
    FromJson,
    Keys,
    Values,
}

impl Builtin {
    fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "len" => Builtin::Len,
            "upper" => Builtin::Upper,
            "lower" => Builtin::Lower,
            "trim" => Builtin::Trim,
            "string" => Builtin::String,
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "toJSON" => Builtin::ToJson,
            "fromJSON" => Builtin::FromJson,
            "keys" => Builtin::Keys,
            "values" => Builtin::Values,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Upper => "upper",
            Builtin::Lower => "lower",
            Builtin::Trim => "trim",
            Builtin::String => "string",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::ToJson => "toJSON",
            Builtin::FromJson => "fromJSON",
            Builtin::Keys => "keys",
            Builtin::Values => "values",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Coalesce,
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Coalesce => "??",
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }

    fn binding_power(self) -> u8 {
        match self {
            BinaryOp::Coalesce => 1,
            BinaryOp::Or => 2,
            BinaryOp::And => 3,
            BinaryOp::Eq | BinaryOp::Ne => 4,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 5,
            BinaryOp::In => 6,
            BinaryOp::Add | BinaryOp::Sub => 7,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Root(Root),
    Array(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    Member {
        target: Box<Expr>,
        key: String,
        optional: bool,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        func: Builtin,
        arg: Box<Expr>,
    },
}

/// Parses expression text into a syntax tree, resolving every name.
pub fn parse(source: &str) -> Result<Expr, EvalError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        index: 0,
    };
    let expr = parser.conditional()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(parser.unexpected(&other.clone())),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    index: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)].token
    }

    fn pos(&self) -> usize {
        self.tokens[self.index.min(self.tokens.len() - 1)].pos
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Token::Punct(p) if *p == punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), EvalError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(EvalError::Syntax {
                pos: self.pos(),
                message: format!("expected {punct:?}, found {}", describe(self.peek())),
            })
        }
    }

    fn unexpected(&self, token: &Token) -> EvalError {
        EvalError::Syntax {
            pos: self.pos(),
            message: format!("unexpected {}", describe(token)),
        }
    }

    fn conditional(&mut self) -> Result<Expr, EvalError> {
        let cond = self.binary(0)?;
        if !self.eat("?") {
            return Ok(cond);
        }
        let then = self.conditional()?;
        self.expect(":")?;
        let otherwise = self.conditional()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn peek_binary(&self) -> Option<BinaryOp> {
        let op = match self.peek() {
            Token::Punct("??") => BinaryOp::Coalesce,
            Token::Punct("||") => BinaryOp::Or,
            Token::Punct("&&") => BinaryOp::And,
            Token::Punct("==") => BinaryOp::Eq,
            Token::Punct("!=") => BinaryOp::Ne,
            Token::Punct("<") => BinaryOp::Lt,
            Token::Punct("<=") => BinaryOp::Le,
            Token::Punct(">") => BinaryOp::Gt,
            Token::Punct(">=") => BinaryOp::Ge,
            Token::Punct("+") => BinaryOp::Add,
            Token::Punct("-") => BinaryOp::Sub,
            Token::Punct("*") => BinaryOp::Mul,
            Token::Punct("/") => BinaryOp::Div,
            Token::Punct("%") => BinaryOp::Mod,
            Token::Ident(word) => match word.as_str() {
                "or" => BinaryOp::Or,
                "and" => BinaryOp::And,
                "in" => BinaryOp::In,
                _ => return None,
            },
            _ => return None,
        };
        Some(op)
    }

    fn binary(&mut self, min_power: u8) -> Result<Expr, EvalError> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek_binary() {
            let power = op.binding_power();
            if power < min_power {
                break;
            }
            self.advance();
            let rhs = self.binary(power + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat("+") {
            return self.unary();
        }
        let op = match self.peek() {
            Token::Punct("!") => Some(UnaryOp::Not),
            Token::Ident(word) if word == "not" => Some(UnaryOp::Not),
            Token::Punct("-") => Some(UnaryOp::Neg),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let operand = self.unary()?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            None => {
                let primary = self.primary()?;
                self.postfix(primary)
            }
        }
    }

    fn postfix(&mut self, mut expr: Expr) -> Result<Expr, EvalError> {
        loop {
            if self.eat(".") {
                let key = self.field_name()?;
                expr = Expr::Member {
                    target: Box::new(expr),
                    key,
                    optional: false,
                };
            } else if self.eat("?.") {
                expr = if self.eat("[") {
                    let index = self.conditional()?;
                    self.expect("]")?;
                    Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                        optional: true,
                    }
                } else {
                    Expr::Member {
                        target: Box::new(expr),
                        key: self.field_name()?,
                        optional: true,
                    }
                };
            } else if self.eat("[") {
                let index = self.conditional()?;
                self.expect("]")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                    optional: false,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn field_name(&mut self) -> Result<String, EvalError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(EvalError::Syntax {
                pos: self.tokens[self.index.saturating_sub(1)].pos,
                message: format!("expected field name, found {}", describe(&other)),
            }),
        }
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        let pos = self.pos();
        match self.advance() {
            Token::Number(number) => Ok(Expr::Literal(Value::Number(number))),
            Token::Str(text) => Ok(Expr::Literal(Value::String(text))),
            Token::Ident(name) => self.name(name, pos),
            Token::Punct("(") => {
                let inner = self.conditional()?;
                self.expect(")")?;
                Ok(inner)
            }
            Token::Punct("[") => {
                let mut items = Vec::new();
                while !self.eat("]") {
                    items.push(self.conditional()?);
                    if !self.eat(",") {
                        self.expect("]")?;
                        break;
                    }
                }
                Ok(Expr::Array(items))
            }
            Token::Punct("{") => {
                let mut entries = Vec::new();
                while !self.eat("}") {
                    let key = match self.advance() {
                        Token::Ident(key) | Token::Str(key) => key,
                        Token::Number(number) => number.to_string(),
                        other => {
                            return Err(EvalError::Syntax {
                                pos: self.tokens[self.index.saturating_sub(1)].pos,
                                message: format!("expected map key, found {}", describe(&other)),
                            });
                        }
                    };
                    self.expect(":")?;
                    entries.push((key, self.conditional()?));
                    if !self.eat(",") {
                        self.expect("}")?;
                        break;
                    }
                }
                Ok(Expr::Map(entries))
            }
            other => Err(EvalError::Syntax {
                pos,
                message: format!("unexpected {}", describe(&other)),
            }),
        }
    }

    fn name(&mut self, name: String, pos: usize) -> Result<Expr, EvalError> {
        match name.as_str() {
            "true" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" => return Ok(Expr::Literal(Value::Bool(false))),
            "nil" | "null" => return Ok(Expr::Literal(Value::Null)),
            "input" => return Ok(Expr::Root(Root::Input)),
            "env" => return Ok(Expr::Root(Root::Env)),
            _ => {}
        }

        let Some(func) = Builtin::from_name(&name) else {
            return Err(EvalError::UnknownName { name, pos });
        };
        if !self.eat("(") {
            return Err(EvalError::UnknownName { name, pos });
        }
        let mut args = Vec::new();
        while !self.eat(")") {
            args.push(self.conditional()?);
            if !self.eat(",") {
                self.expect(")")?;
                break;
            }
        }
        if args.len() != 1 {
            return Err(EvalError::Syntax {
                pos,
                message: format!(
                    "{}() takes exactly 1 argument, {} given",
                    func.name(),
                    args.len()
                ),
            });
        }
        let arg = args.remove(0);
        Ok(Expr::Call {
            func,
            arg: Box::new(arg),
        })
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(number) => format!("number {number}"),
        Token::Str(text) => format!("string {text:?}"),
        Token::Ident(name) => format!("name {name}"),
        Token::Punct(punct) => format!("{punct:?}"),
        Token::Eof => "end of expression".to_string(),
    }
}
