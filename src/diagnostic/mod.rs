pub mod json;

use crate::fault::{Fault, FaultKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Error,
    #[allow(dead_code)] // forward infrastructure for future warning diagnostics
    Warning,
}

/// A host-facing report about a fault: the message plus whatever location
/// and advice we can attach. Rendering (JSON) lives in submodules so hosts
/// can pick a format without reformatting the data themselves.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub pc: Option<usize>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            pc: None,
            notes: Vec::new(),
            suggestion: None,
        }
    }

    pub fn at_pc(mut self, pc: usize) -> Self {
        self.pc = Some(pc);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", severity, self.message)?;
        if let Some(pc) = self.pc {
            write!(f, " (at pc {})", pc)?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {}", note)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  help: {}", suggestion)?;
        }
        Ok(())
    }
}

impl From<&Fault> for Diagnostic {
    fn from(fault: &Fault) -> Self {
        let mut d = Diagnostic::error(fault.kind.to_string()).at_pc(fault.pc);
        match &fault.kind {
            FaultKind::StackOverflow { limit } => {
                d = d
                    .with_note(format!("the frame depth limit is {}", limit))
                    .with_suggestion("check for runaway recursion or raise the depth limit");
            }
            FaultKind::StackUnderflow => {
                d = d.with_note("RET only makes sense inside a called function");
            }
            FaultKind::NoMatchingCase { table } => {
                d = d.with_note(format!("pattern table at constant index {}", table));
            }
            FaultKind::BadConstant { index, .. } => {
                d = d.with_note(format!("constant pool index {}", index));
            }
            _ => {}
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_error_builder() {
        let d = Diagnostic::error("something went wrong");
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.message, "something went wrong");
        assert!(d.pc.is_none());
        assert!(d.notes.is_empty());
        assert!(d.suggestion.is_none());
    }

    #[test]
    fn diagnostic_with_note_and_suggestion() {
        let d = Diagnostic::error("depth exceeded")
            .with_note("the frame depth limit is 8")
            .with_suggestion("raise the depth limit");
        assert_eq!(d.notes, vec!["the frame depth limit is 8"]);
        assert_eq!(d.suggestion.as_deref(), Some("raise the depth limit"));
    }

    #[test]
    fn from_fault_carries_the_pc() {
        let f = Fault::at(7, FaultKind::StackUnderflow);
        let d = Diagnostic::from(&f);
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.pc, Some(7));
        assert!(d.message.contains("RET"));
        assert!(!d.notes.is_empty());
    }

    #[test]
    fn from_overflow_fault_suggests_a_fix() {
        let f = Fault::at(3, FaultKind::StackOverflow { limit: 8 });
        let d = Diagnostic::from(&f);
        assert!(d.notes.iter().any(|n| n.contains('8')));
        assert!(d.suggestion.is_some());
    }

    #[test]
    fn display_renders_severity_pc_and_notes() {
        let d = Diagnostic::error("depth exceeded")
            .at_pc(3)
            .with_note("the frame depth limit is 8")
            .with_suggestion("raise the depth limit");
        let text = d.to_string();
        assert!(text.starts_with("error: depth exceeded (at pc 3)"));
        assert!(text.contains("note: the frame depth limit is 8"));
        assert!(text.contains("help: raise the depth limit"));
    }

    #[test]
    fn from_no_matching_case_names_the_table() {
        let f = Fault::at(4, FaultKind::NoMatchingCase { table: 2 });
        let d = Diagnostic::from(&f);
        assert!(d.notes.iter().any(|n| n.contains("index 2")));
    }
}
