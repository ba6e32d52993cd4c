use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Invalid node in parse tree: {0}")]
    InvalidNode(String),
    #[error("Invalid operand for \"{tag}\": {message}")]
    InvalidOperand { tag: String, message: String },
    #[error("Invalid literal id {0}")]
    InvalidLiteral(u64),
    #[error("Invalid parse tree document: {0}")]
    Json(String),
}

impl DecodeError {
    pub(crate) fn operand(tag: &str, message: impl Into<String>) -> Self {
        DecodeError::InvalidOperand {
            tag: tag.to_string(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err.to_string())
    }
}
