use serde::Serialize;

use crate::value::Tag;

/// Everything that can stop the machine. All faults are terminal: execution
/// halts where the fault occurred and the host decides what to do next.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaultKind {
    #[error("malformed instruction: {reason}")]
    EncodingError { reason: String },
    #[error("{op} expected {expected}, got {actual}")]
    TypeError {
        op: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("expected {expected} payload, value is tagged {actual}")]
    TagMismatch { expected: Tag, actual: Tag },
    #[error("call depth limit of {limit} exceeded")]
    StackOverflow { limit: usize },
    #[error("RET without a caller frame")]
    StackUnderflow,
    #[error("no case in pattern table at constant index {table} matches the subject")]
    NoMatchingCase { table: usize },
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    #[error("constant pool entry {index} unusable: {reason}")]
    BadConstant { index: usize, reason: &'static str },
}

/// A [`FaultKind`] pinned to the program counter at which it occurred.
/// Faults raised while loading the constant pool report pc 0.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[error("fault at pc {pc}: {kind}")]
pub struct Fault {
    pub pc: usize,
    pub kind: FaultKind,
}

impl Fault {
    pub fn at(pc: usize, kind: FaultKind) -> Self {
        Fault { pc, kind }
    }
}
