//! Domain error types.

use std::fmt;

/// A parse error with position information for source parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with the offending source line and a caret under the error position.
    pub fn display_with_context(&self, input: &str) -> String {
        let position = self.position.min(input.len());
        let line_start = input[..position].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = input[position..]
            .find('\n')
            .map(|i| position + i)
            .unwrap_or(input.len());
        let line_no = input[..line_start].matches('\n').count() + 1;
        let column = input[line_start..position].chars().count();
        let caret = " ".repeat(column) + "^";
        format!(
            "{line}\n{caret}\nline {line_no}: {err}",
            line = &input[line_start..line_end],
            caret = caret,
            line_no = line_no,
            err = self
        )
    }
}

/// Why a call's arguments could not be matched against any overload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArityProblem {
    /// A required parameter received no argument.
    Missing { parameter: String },
    /// More arguments than the widest overload accepts.
    TooMany { max: usize },
}

impl fmt::Display for ArityProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArityProblem::Missing { parameter } => write!(f, "missing argument '{}'", parameter),
            ArityProblem::TooMany { max } => write!(f, "too many arguments (at most {})", max),
        }
    }
}

/// Top-level error type for mqlsim.
#[derive(Debug, thiserror::Error)]
pub enum MqlError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("compile error: {reason}")]
    Compile { reason: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("cannot call '{function}' with {supplied} argument(s): {problem}")]
    ArgumentCount {
        function: String,
        supplied: usize,
        problem: ArityProblem,
    },

    #[error("argument '{parameter}' of '{function}' must be passed by reference")]
    ByRefRequired { function: String, parameter: String },

    #[error("argument '{parameter}' of '{function}' expects {expected}, got {found}")]
    ArgumentType {
        function: String,
        parameter: String,
        expected: String,
        found: String,
    },

    #[error("runtime error: {reason}")]
    Runtime { reason: String },

    #[error("custom indicator '{name}' is already being computed (cyclic iCustom call)")]
    CyclicIndicator { name: String },

    #[error("CSV error at line {line}: {reason}")]
    Csv { line: usize, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MqlError {
    pub fn runtime(reason: impl Into<String>) -> Self {
        MqlError::Runtime {
            reason: reason.into(),
        }
    }

    /// True for arity failures caused by passing more arguments than any overload accepts.
    pub fn is_too_many_arguments(&self) -> bool {
        matches!(
            self,
            MqlError::ArgumentCount {
                problem: ArityProblem::TooMany { .. },
                ..
            }
        )
    }
}

impl From<&MqlError> for std::process::ExitCode {
    fn from(err: &MqlError) -> Self {
        let code: u8 = match err {
            MqlError::Io(_) => 1,
            MqlError::ConfigParse { .. } | MqlError::ConfigInvalid { .. } => 2,
            MqlError::Csv { .. } => 3,
            MqlError::Parse(_) | MqlError::Compile { .. } => 4,
            MqlError::UnknownFunction { .. }
            | MqlError::ArgumentCount { .. }
            | MqlError::ByRefRequired { .. }
            | MqlError::ArgumentType { .. }
            | MqlError::Runtime { .. }
            | MqlError::CyclicIndicator { .. } => 5,
            MqlError::Report { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
