use miette::Diagnostic;

use crate::ast::error::DecodeError;
use crate::codegen::GenerateError;
use crate::runtime::error::RuntimeError;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum InnerError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Represents a high-level error with diagnostic information for the user.
#[derive(PartialEq, Clone, Debug, thiserror::Error)]
#[error("{cause}")]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
}

impl Error {
    pub fn is_runtime(&self) -> bool {
        matches!(self.cause, InnerError::Runtime(_))
    }
}

impl From<InnerError> for Error {
    fn from(cause: InnerError) -> Self {
        Self { cause }
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        InnerError::from(err).into()
    }
}

impl From<GenerateError> for Error {
    fn from(err: GenerateError) -> Self {
        InnerError::from(err).into()
    }
}

impl From<RuntimeError> for Error {
    fn from(err: RuntimeError) -> Self {
        InnerError::from(err).into()
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let c = match &self.cause {
            InnerError::Decode(DecodeError::InvalidNode(_)) => "quill::decode::invalid_node",
            InnerError::Decode(DecodeError::InvalidOperand { .. }) => "quill::decode::invalid_operand",
            InnerError::Decode(DecodeError::InvalidLiteral(_)) => "quill::decode::invalid_literal",
            InnerError::Decode(DecodeError::Json(_)) => "quill::decode::json",
            InnerError::Generate(GenerateError::InvalidNode(_)) => "quill::generate::invalid_node",
            InnerError::Generate(GenerateError::InvalidCallTarget(_)) => "quill::generate::invalid_call_target",
            InnerError::Runtime(RuntimeError::ModuleNotResolved(_)) => "quill::runtime::module_not_resolved",
            InnerError::Runtime(RuntimeError::NotBlessed { .. }) => "quill::runtime::not_blessed",
            InnerError::Runtime(RuntimeError::PipeNotFound(_)) => "quill::runtime::pipe_not_found",
            InnerError::Runtime(RuntimeError::Host(_)) => "quill::runtime::host",
        };

        Some(Box::new(c))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            InnerError::Decode(DecodeError::InvalidNode(_)) | InnerError::Generate(GenerateError::InvalidNode(_)) => {
                Some("The parse tree does not come from a compatible front end. Regenerate it.".to_string())
            }
            InnerError::Decode(DecodeError::InvalidOperand { tag, .. }) => {
                Some(format!("Check the operands of the \"{tag}\" node."))
            }
            InnerError::Decode(DecodeError::InvalidLiteral(id)) => {
                Some(format!("Literal {id} is not in the literal table. Check the \"l\" array."))
            }
            InnerError::Decode(DecodeError::Json(_)) => {
                Some("The document must be a JSON object with \"n\" and \"l\" members.".to_string())
            }
            InnerError::Generate(GenerateError::InvalidCallTarget(_)) => Some(
                "Only identifiers, member accesses, calls and binds can be called.".to_string(),
            ),
            InnerError::Runtime(RuntimeError::ModuleNotResolved(name)) => Some(format!(
                "Module \"{name}\" was not found by any resolver. Register it before rendering."
            )),
            InnerError::Runtime(RuntimeError::NotBlessed { type_name, .. }) => Some(format!(
                "The target is a {type_name}. Host functions must be blessed to be called from a template."
            )),
            InnerError::Runtime(RuntimeError::PipeNotFound(name)) => Some(format!(
                "Define \"{name}\" in the interpolated data or as a global."
            )),
            InnerError::Runtime(RuntimeError::Host(_)) => None,
        };

        msg.map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::error::Action;
    use rstest::rstest;

    #[rstest]
    #[case::invalid_node(DecodeError::InvalidNode("zz".to_string()).into(), "quill::decode::invalid_node")]
    #[case::invalid_literal(DecodeError::InvalidLiteral(9).into(), "quill::decode::invalid_literal")]
    #[case::invalid_call_target(
        GenerateError::InvalidCallTarget("\"ar\"".to_string()).into(),
        "quill::generate::invalid_call_target"
    )]
    #[case::module_not_resolved(
        RuntimeError::ModuleNotResolved("lib".into()).into(),
        "quill::runtime::module_not_resolved"
    )]
    #[case::not_blessed(
        RuntimeError::NotBlessed { action: Action::Call, type_name: "function" }.into(),
        "quill::runtime::not_blessed"
    )]
    fn test_error_codes(#[case] error: Error, #[case] expected: &str) {
        assert_eq!(error.code().map(|c| c.to_string()), Some(expected.to_string()));
    }

    #[test]
    fn test_help_names_the_module() {
        let error = Error::from(RuntimeError::ModuleNotResolved("lib/helpers".into()));
        let help = error.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("lib/helpers"));
        assert!(error.is_runtime());
    }

    #[test]
    fn test_display_is_transparent() {
        let error = Error::from(RuntimeError::host("boom"));
        assert_eq!(error.to_string(), "boom");
        assert!(error.help().is_none());
    }
}
