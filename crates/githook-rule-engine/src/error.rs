use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unexpected end of expression")]
    UnexpectedEof,
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("variable '{0}' is missing and the rule is not in lenient mode")]
    MissingVariable(String),
    #[error("type error: {0}")]
    TypeMismatch(String),
    #[error("jsonpath error: {0}")]
    JsonPath(String),
}
