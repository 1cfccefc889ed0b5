//! Constant pool reader. The caller hands over a flat sequence of scalar
//! values and structural markers; everything compound — data records and
//! pattern tables — is parsed into owned trees exactly once, here, so the
//! execution loop never re-reads raw pool slots.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::fault::FaultKind;
use crate::value::{DataRecord, Value};

/// One slot of the caller-supplied constant pool. `MatchHeader`,
/// `DataHeader` and `MatchVar` are structural markers that appear only in
/// pools, never in registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEntry {
    /// A scalar value (`Number`, `Symbol` or scalar `DataSymbol`).
    Value(Value),
    /// Starts a pattern table of `case_count` cases, one slot each.
    MatchHeader(usize),
    /// Starts a compound record of `arity` field slots.
    DataHeader { tag: u32, arity: usize },
    /// A bind-instead-of-compare pattern field, targeting a register slot.
    MatchVar(usize),
}

impl PoolEntry {
    pub fn number(n: i64) -> Self {
        PoolEntry::Value(Value::Number(n))
    }

    pub fn symbol(id: u32) -> Self {
        PoolEntry::Value(Value::Symbol(id))
    }

    /// A scalar data symbol — or, when `id` addresses a `DataHeader` slot,
    /// a reference to that record.
    pub fn data_symbol(id: u32) -> Self {
        PoolEntry::Value(Value::DataSymbol(id))
    }
}

/// One case of a pattern table, parsed into a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Number(i64),
    Symbol(u32),
    DataSymbol(u32),
    Record { tag: u32, fields: Vec<Pattern> },
    /// Matches anything; binds the subject at `bind_base + slot`.
    Bind(usize),
}

/// An ordered case list. Case order is dispatch order: the index of the
/// first matching case selects the jump slot after the `MATCH` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTable {
    pub cases: Vec<Pattern>,
}

/// The parsed pool: raw slots for scalar loads plus the record values and
/// pattern tables built from the markers. Read-only after `parse`.
#[derive(Debug)]
pub struct ConstantPool {
    entries: Vec<PoolEntry>,
    records: HashMap<usize, Value>,
    pattern_only: HashSet<usize>,
    tables: HashMap<usize, PatternTable>,
}

impl ConstantPool {
    /// Walks the pool once, building every record and pattern table. Fails
    /// on markers in impossible positions, truncated structures, cyclic
    /// record references, and non-scalar values in value slots.
    pub fn parse(entries: &[PoolEntry]) -> Result<Self, FaultKind> {
        for (index, entry) in entries.iter().enumerate() {
            if let PoolEntry::Value(v) = entry {
                if matches!(v, Value::Data(_) | Value::Closure(_)) {
                    return Err(FaultKind::BadConstant {
                        index,
                        reason: "pool values must be scalar",
                    });
                }
            }
        }

        let mut parser = Parser {
            entries,
            cache: HashMap::new(),
            visiting: Vec::new(),
        };

        let mut tables = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            match entry {
                PoolEntry::DataHeader { .. } => {
                    parser.pattern_at(index)?;
                }
                PoolEntry::MatchHeader(case_count) => {
                    tables.insert(index, parser.table_at(index, *case_count)?);
                }
                _ => {}
            }
        }

        let mut records = HashMap::new();
        let mut pattern_only = HashSet::new();
        for (&index, pattern) in &parser.cache {
            match pattern_to_value(pattern) {
                Some(value) => {
                    records.insert(index, value);
                }
                None => {
                    pattern_only.insert(index);
                }
            }
        }

        Ok(ConstantPool {
            entries: entries.to_vec(),
            records,
            pattern_only,
            tables,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scalar load (`LOADc`): the slot must hold a plain value.
    pub fn scalar(&self, index: usize) -> Result<Value, FaultKind> {
        match self.entries.get(index) {
            Some(PoolEntry::Value(v)) => Ok(v.clone()),
            Some(_) => Err(FaultKind::BadConstant {
                index,
                reason: "scalar load hit a structural marker",
            }),
            None => Err(FaultKind::IndexOutOfRange {
                what: "constant pool",
                index,
                len: self.entries.len(),
            }),
        }
    }

    /// Data-symbol load (`LOADsd`): the parsed record at `index` if one
    /// exists there, otherwise a scalar data symbol carrying `index` — ids
    /// and record addresses share a namespace by emitter convention.
    pub fn data_symbol(&self, index: usize) -> Result<Value, FaultKind> {
        if let Some(record) = self.records.get(&index) {
            return Ok(record.clone());
        }
        if self.pattern_only.contains(&index) {
            return Err(FaultKind::BadConstant {
                index,
                reason: "record contains match variables and is pattern-only",
            });
        }
        Ok(Value::DataSymbol(index as u32))
    }

    /// The pattern table starting at `index`, if any.
    pub fn table(&self, index: usize) -> Option<&PatternTable> {
        self.tables.get(&index)
    }
}

// ── Pool parsing ─────────────────────────────────────────────────────

struct Parser<'a> {
    entries: &'a [PoolEntry],
    cache: HashMap<usize, Pattern>,
    visiting: Vec<usize>,
}

impl<'a> Parser<'a> {
    /// Parses the record/pattern headed at `index` into a tree, memoized.
    fn pattern_at(&mut self, index: usize) -> Result<Pattern, FaultKind> {
        if let Some(p) = self.cache.get(&index) {
            return Ok(p.clone());
        }
        if self.visiting.contains(&index) {
            return Err(FaultKind::BadConstant {
                index,
                reason: "cyclic record reference",
            });
        }

        let &PoolEntry::DataHeader { tag, arity } = &self.entries[index] else {
            return Err(FaultKind::BadConstant {
                index,
                reason: "expected a data symbol header",
            });
        };

        self.visiting.push(index);
        let mut fields = Vec::with_capacity(arity);
        for field_index in index + 1..=index + arity {
            if field_index >= self.entries.len() {
                self.visiting.pop();
                return Err(FaultKind::BadConstant {
                    index,
                    reason: "record truncated by end of pool",
                });
            }
            let field = self.field_at(field_index)?;
            fields.push(field);
        }
        self.visiting.pop();

        let pattern = Pattern::Record { tag, fields };
        self.cache.insert(index, pattern.clone());
        Ok(pattern)
    }

    /// One field slot of a record: a scalar, a reference to another record,
    /// or a match variable.
    fn field_at(&mut self, index: usize) -> Result<Pattern, FaultKind> {
        match &self.entries[index] {
            PoolEntry::Value(Value::Number(n)) => Ok(Pattern::Number(*n)),
            PoolEntry::Value(Value::Symbol(s)) => Ok(Pattern::Symbol(*s)),
            PoolEntry::Value(Value::DataSymbol(d)) => self.data_symbol_pattern(*d),
            PoolEntry::MatchVar(slot) => Ok(Pattern::Bind(*slot)),
            _ => Err(FaultKind::BadConstant {
                index,
                reason: "record field must be a scalar or match variable",
            }),
        }
    }

    /// A `DataSymbol(id)` slot is a record reference when `id` addresses a
    /// header, a scalar pattern otherwise.
    fn data_symbol_pattern(&mut self, id: u32) -> Result<Pattern, FaultKind> {
        let target = id as usize;
        if matches!(
            self.entries.get(target),
            Some(PoolEntry::DataHeader { .. })
        ) {
            self.pattern_at(target)
        } else {
            Ok(Pattern::DataSymbol(id))
        }
    }

    fn table_at(&mut self, index: usize, case_count: usize) -> Result<PatternTable, FaultKind> {
        let mut cases = Vec::with_capacity(case_count);
        for case_index in index + 1..=index + case_count {
            if case_index >= self.entries.len() {
                return Err(FaultKind::BadConstant {
                    index,
                    reason: "pattern table truncated by end of pool",
                });
            }
            // A match variable binds a record field; a whole case made of
            // one would be an implicit wildcard, which no emitter produces.
            if matches!(self.entries[case_index], PoolEntry::MatchVar(_)) {
                return Err(FaultKind::BadConstant {
                    index: case_index,
                    reason: "match variable cannot stand alone as a case",
                });
            }
            cases.push(self.field_at(case_index)?);
        }
        Ok(PatternTable { cases })
    }
}

/// A pattern with no binds doubles as a constructible value.
fn pattern_to_value(pattern: &Pattern) -> Option<Value> {
    match pattern {
        Pattern::Number(n) => Some(Value::Number(*n)),
        Pattern::Symbol(s) => Some(Value::Symbol(*s)),
        Pattern::DataSymbol(d) => Some(Value::DataSymbol(*d)),
        Pattern::Record { tag, fields } => {
            let fields = fields
                .iter()
                .map(pattern_to_value)
                .collect::<Option<Vec<_>>>()?;
            Some(Value::Data(Rc::new(DataRecord { tag: *tag, fields })))
        }
        Pattern::Bind(_) => None,
    }
}
