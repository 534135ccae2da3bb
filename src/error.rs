use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// File and line a unit or token came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
}

impl SourceLoc {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            write!(f, "<internal>")
        } else {
            write!(f, "{}:{}", self.file, self.line)
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AsmError {
    #[error("{loc}: {message}")]
    Syntax { loc: SourceLoc, message: String },
    #[error("{loc}: undefined symbol \"{name}\"")]
    UndefinedSymbol { loc: SourceLoc, name: String },
    #[error("{loc}: {message}")]
    CapacityExceeded { loc: SourceLoc, message: String },
    #[error("could not find function \"main\"")]
    MissingEntryPoint,
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{loc}: cannot include {}: {source}", path.display())]
    Include {
        loc: SourceLoc,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{loc}: internal error: {message}")]
    Internal { loc: SourceLoc, message: String },
    #[error("assembly aborted after {} error(s)", errors.len())]
    Aborted { errors: Vec<AsmError> },
}

impl AsmError {
    pub fn syntax(loc: &SourceLoc, message: impl Into<String>) -> Self {
        Self::Syntax {
            loc: loc.clone(),
            message: message.into(),
        }
    }

    pub fn capacity(loc: &SourceLoc, message: impl Into<String>) -> Self {
        Self::CapacityExceeded {
            loc: loc.clone(),
            message: message.into(),
        }
    }

    pub fn internal(loc: &SourceLoc, message: impl Into<String>) -> Self {
        Self::Internal {
            loc: loc.clone(),
            message: message.into(),
        }
    }
}

/// Recoverable conditions noticed while assembling. They are logged when
/// raised and kept on the object file for later inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    DuplicateLabel {
        name: String,
        first: SourceLoc,
        duplicate: SourceLoc,
    },
    StackSizeRounded { requested: u32, rounded: u32 },
    ConstantRedefined { name: String, loc: SourceLoc },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DuplicateLabel {
                name,
                first,
                duplicate,
            } => write!(
                f,
                "{duplicate}: label \"{name}\" already defined at {first}; keeping the first definition"
            ),
            Warning::StackSizeRounded { requested, rounded } => write!(
                f,
                "stack size {requested} is not a multiple of 256; rounded up to {rounded}"
            ),
            Warning::ConstantRedefined { name, loc } => {
                write!(f, "{loc}: constant \"{name}\" redefined")
            }
        }
    }
}

pub type Result<T, E = AsmError> = std::result::Result<T, E>;
