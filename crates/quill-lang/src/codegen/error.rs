use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    #[error("Invalid node in parse tree: {0}")]
    InvalidNode(String),
    #[error("Invalid call target: {0}")]
    InvalidCallTarget(String),
}
