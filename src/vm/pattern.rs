//! Structural matching of a runtime value against a parsed pattern table.
//! Dispatch returns the index of the first matching case; the execution loop
//! turns that index into a branch through the jump slots that follow the
//! `MATCH` instruction.

use crate::pool::{Pattern, PatternTable};
use crate::value::Value;

/// A binding produced by a successful match: the register slot (relative to
/// the instruction's bind base) and the value captured there.
pub(crate) type Binding = (usize, Value);

/// Finds the first case the subject matches. Bindings are collected per case
/// and only surface for the winning one, so a partial match that fails on a
/// later field leaves no trace.
pub(crate) fn dispatch(table: &PatternTable, subject: &Value) -> Option<(usize, Vec<Binding>)> {
    for (index, case) in table.cases.iter().enumerate() {
        let mut bindings = Vec::new();
        if matches(case, subject, &mut bindings) {
            return Some((index, bindings));
        }
    }
    None
}

fn matches(pattern: &Pattern, subject: &Value, bindings: &mut Vec<Binding>) -> bool {
    match (pattern, subject) {
        (Pattern::Bind(slot), _) => {
            bindings.push((*slot, subject.clone()));
            true
        }
        (Pattern::Number(n), Value::Number(m)) => n == m,
        (Pattern::Symbol(s), Value::Symbol(t)) => s == t,
        (Pattern::DataSymbol(d), Value::DataSymbol(e)) => d == e,
        (Pattern::Record { tag, fields }, Value::Data(record)) => {
            *tag == record.tag
                && fields.len() == record.fields.len()
                && fields
                    .iter()
                    .zip(&record.fields)
                    .all(|(p, v)| matches(p, v, bindings))
        }
        _ => false,
    }
}
