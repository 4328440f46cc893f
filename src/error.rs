use std::{io, path::PathBuf};

use crate::ast::Segment;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("`{keyword}` is missing its {operand}")]
    MissingOperand {
        keyword: &'static str,
        operand: &'static str,
    },
    #[error("unknown segment '{0}'")]
    InvalidSegment(String),
    #[error("'{0}' is not a non-negative 16-bit integer")]
    InvalidIndex(String),
    #[error("'{0}' is not a valid symbol")]
    InvalidSymbol(String),
    #[error("cannot pop into the constant segment")]
    PopConstant,
    #[error("index {index} is out of range for {segment} (max {max})")]
    IndexOutOfRange { segment: Segment, index: u16, max: u16 },
    #[error("unexpected trailing operand(s) '{0}'")]
    ExtraOperands(String),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {kind} in `{text}`")]
pub struct ParseError {
    pub line: usize,
    pub text: String,
    pub kind: ParseErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{}: {source}", .path.display())]
    Parse { path: PathBuf, source: ParseError },
    #[error("{}: not a .vm file or a directory", .0.display())]
    InvalidInput(PathBuf),
    #[error("{}: no .vm files found", .0.display())]
    NoSources(PathBuf),
    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Error {
        let path = path.into();
        move |source| Error::Io { path, source }
    }
}
