//! Runtime values: a tagged sum type rather than a packed machine word, so
//! the tag/payload contract is explicit and the compiler checks every use.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::fault::FaultKind;

/// The tag half of the tag/payload contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Number,
    Symbol,
    DataSymbol,
    Closure,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Number => write!(f, "number"),
            Tag::Symbol => write!(f, "symbol"),
            Tag::DataSymbol => write!(f, "data symbol"),
            Tag::Closure => write!(f, "closure"),
        }
    }
}

/// A compound data symbol: an interned tag plus an ordered field list.
/// Built only from the constant pool, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecord {
    pub tag: u32,
    pub fields: Vec<Value>,
}

/// A code entry address plus the values captured when the closure was made.
/// Captures are by value: they outlive the frame that created them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    pub entry: usize,
    pub captured: Vec<Value>,
}

/// A tagged runtime datum. `Data` and `Closure` share their payload through
/// `Rc` so register moves and captures stay cheap; everything is immutable
/// once constructed, so the sharing is never observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Number(i64),
    Symbol(u32),
    DataSymbol(u32),
    Data(Rc<DataRecord>),
    Closure(Rc<Closure>),
}

impl Value {
    pub fn tag(&self) -> Tag {
        match self {
            Value::Number(_) => Tag::Number,
            Value::Symbol(_) => Tag::Symbol,
            Value::DataSymbol(_) | Value::Data(_) => Tag::DataSymbol,
            Value::Closure(_) => Tag::Closure,
        }
    }

    /// Short tag name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Symbol(_) => "symbol",
            Value::DataSymbol(_) | Value::Data(_) => "data symbol",
            Value::Closure(_) => "closure",
        }
    }

    /// Packs a payload under a scalar tag. Returns `None` for `Tag::Closure`
    /// (closures carry structure, not a payload) and for payloads outside the
    /// tag's representable range (symbol ids are 32-bit).
    pub fn pack(payload: i64, tag: Tag) -> Option<Value> {
        match tag {
            Tag::Number => Some(Value::Number(payload)),
            Tag::Symbol => u32::try_from(payload).ok().map(Value::Symbol),
            Tag::DataSymbol => u32::try_from(payload).ok().map(Value::DataSymbol),
            Tag::Closure => None,
        }
    }

    /// Extracts the payload, checking the tag first. Compound data symbols
    /// carry structure rather than a scalar payload, so they fail with their
    /// own type error instead of a tag mismatch.
    pub fn unpack(&self, tag: Tag) -> Result<i64, FaultKind> {
        match (self, tag) {
            (Value::Number(n), Tag::Number) => Ok(*n),
            (Value::Symbol(s), Tag::Symbol) => Ok(i64::from(*s)),
            (Value::DataSymbol(d), Tag::DataSymbol) => Ok(i64::from(*d)),
            (Value::Data(_), Tag::DataSymbol) => Err(FaultKind::TypeError {
                op: "unpack",
                expected: "scalar data symbol",
                actual: "compound data symbol",
            }),
            _ => Err(FaultKind::TagMismatch {
                expected: tag,
                actual: self.tag(),
            }),
        }
    }

    pub(crate) fn number(&self) -> Option<i64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub(crate) fn closure(&self) -> Option<&Rc<Closure>> {
        match self {
            Value::Closure(c) => Some(c),
            _ => None,
        }
    }
}

impl Default for Value {
    /// The value of a register that nothing has written yet.
    fn default() -> Self {
        Value::Number(0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Symbol(s) => write!(f, "sym:{}", s),
            Value::DataSymbol(d) => write!(f, "dsym:{}", d),
            Value::Data(rec) => {
                write!(f, "dsym#{}(", rec.tag)?;
                for (i, field) in rec.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, ")")
            }
            Value::Closure(c) => write!(f, "closure@{}/{}", c.entry, c.captured.len()),
        }
    }
}
