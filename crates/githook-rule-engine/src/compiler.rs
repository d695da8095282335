use std::collections::BTreeMap;

use crate::ast::{synthetic_name, BinOp, Expr, Literal, VariableRef};
use crate::error::CompileError;
use crate::lexer::{Lexer, Token};

const KNOWN_FUNCTIONS: &[(&str, usize)] = &[("contains", 2), ("like", 2)];

/// The output of compiling a rule's `when` (or a transform guard) string:
/// the parsed AST plus the set of distinct variables it references, so the
/// evaluator's caller knows exactly what to resolve (spec §6 "Compilation
/// produces ... the list of variables the expression needs").
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    pub ast: Expr,
    pub variables: Vec<VariableRef>,
}

pub fn compile(source: &str) -> Result<CompiledExpr, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        variables: BTreeMap::new(),
    };
    let ast = parser.parse_or()?;
    parser.expect_eof()?;
    Ok(CompiledExpr {
        ast,
        variables: parser.variables.into_values().collect(),
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    variables: BTreeMap<String, VariableRef>,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_eof(&self) -> Result<(), CompileError> {
        match self.peek() {
            Token::Eof => Ok(()),
            other => Err(CompileError::Syntax(format!("unexpected trailing token {other:?}"))),
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), CompileError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(CompileError::Syntax(format!(
                "expected {expected:?}, found {:?}",
                self.peek()
            )))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_and()?;
        while *self.peek() == Token::Or {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Bin(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_not()?;
        while *self.peek() == Token::And {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Expr::Bin(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, CompileError> {
        if *self.peek() == Token::Not {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.parse_add()?;
        let op = match self.peek() {
            Token::Eq => BinOp::Eq,
            Token::Ne => BinOp::Ne,
            Token::Lt => BinOp::Lt,
            Token::Le => BinOp::Le,
            Token::Gt => BinOp::Gt,
            Token::Ge => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_add()?;
        Ok(Expr::Bin(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_add(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        if *self.peek() == Token::Minus {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Bin(
                BinOp::Sub,
                Box::new(Expr::Literal(Literal::Number(0.0))),
                Box::new(inner),
            ));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::True => Ok(Expr::Literal(Literal::Bool(true))),
            Token::False => Ok(Expr::Literal(Literal::Bool(false))),
            Token::Null => Ok(Expr::Literal(Literal::Null)),
            Token::JsonPath(path) => Ok(self.register_variable(path, true)),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if *self.peek() == Token::LParen {
                    self.parse_call(name)
                } else {
                    Ok(self.register_variable(name, false))
                }
            }
            other => Err(CompileError::Syntax(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_call(&mut self, name: String) -> Result<Expr, CompileError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if *self.peek() != Token::RParen {
            loop {
                args.push(self.parse_or()?);
                if *self.peek() == Token::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(&Token::RParen)?;
        let known = KNOWN_FUNCTIONS
            .iter()
            .find(|(fname, _)| *fname == name)
            .ok_or_else(|| CompileError::UnknownFunction(name.clone()))?;
        if args.len() != known.1 {
            return Err(CompileError::ArityMismatch {
                name,
                expected: known.1,
                got: args.len(),
            });
        }
        Ok(Expr::Call(name, args))
    }

    fn register_variable(&mut self, source: String, is_jsonpath: bool) -> Expr {
        let synthetic = synthetic_name(&source);
        self.variables
            .entry(synthetic.clone())
            .or_insert_with(|| VariableRef {
                synthetic: synthetic.clone(),
                source: source.clone(),
                is_jsonpath,
            });
        Expr::Var { synthetic, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_simple_equality_and_tracks_variable() {
        let compiled = compile("action == \"opened\"").unwrap();
        assert_eq!(compiled.variables.len(), 1);
        assert_eq!(compiled.variables[0].source, "action");
        assert!(!compiled.variables[0].is_jsonpath);
    }

    #[test]
    fn compiles_jsonpath_variable() {
        let compiled = compile("$.pull_request.merged == true").unwrap();
        assert_eq!(compiled.variables.len(), 1);
        assert!(compiled.variables[0].is_jsonpath);
        assert_eq!(compiled.variables[0].synthetic, synthetic_name("$.pull_request.merged"));
    }

    #[test]
    fn deduplicates_repeated_variable_references() {
        let compiled = compile("action == \"opened\" || action == \"edited\"").unwrap();
        assert_eq!(compiled.variables.len(), 1);
    }

    #[test]
    fn rejects_unknown_function() {
        assert!(matches!(
            compile("frobnicate(action)"),
            Err(CompileError::UnknownFunction(_))
        ));
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(matches!(
            compile("contains(action)"),
            Err(CompileError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn parses_contains_and_like_calls() {
        let compiled = compile("contains(labels, \"bug\") && like(title, \"fix:%\")").unwrap();
        assert_eq!(compiled.variables.len(), 2);
    }

    #[test]
    fn respects_operator_precedence() {
        let compiled = compile("1 + 2 * 3 == 7").unwrap();
        match compiled.ast {
            Expr::Bin(BinOp::Eq, lhs, _) => match *lhs {
                Expr::Bin(BinOp::Add, _, rhs) => {
                    assert!(matches!(*rhs, Expr::Bin(BinOp::Mul, _, _)));
                }
                other => panic!("unexpected lhs shape: {other:?}"),
            },
            other => panic!("unexpected ast shape: {other:?}"),
        }
    }
}
