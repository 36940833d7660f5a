//! Value model for the query layer: literal values, deferred `?` parameters,
//! and the deferred predicate/counter-update objects that can appear inside a
//! parsed statement.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use uuid::Uuid;

use crate::error::{Error, Result};

/// A result row or attribute set: column name to value.
pub type Row = BTreeMap<String, Value>;

/// A single typed CQL value.
///
/// `Value` carries a *total* ordering (`Ord`/`Eq`/`Hash`, floats compared via
/// `total_cmp`) so tuples of values can key the partition and clustering
/// maps. Filter predicates use the looser [`Value::compare`] instead, which
/// cross-compares integers and floats and refuses unrelated types.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(i64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Semantic comparison used by filter evaluation. Integers and floats
    /// compare numerically; otherwise only same-kind values are comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Text(_) => 4,
            Value::Uuid(_) => 5,
            Value::Timestamp(_) => 6,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Uuid(a), Value::Uuid(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Uuid(u) => u.hash(state),
            Value::Timestamp(t) => t.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::Timestamp(t) => write!(f, "{t}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

/// A statement term: either a realized value or a positional `?` parameter
/// that has not been supplied yet.
///
/// `Pending` is distinct from `Bound(Value::Null)` so "not yet supplied" can
/// never be confused with an explicit null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Bound(Value),
    Pending,
}

impl Term {
    pub fn is_pending(&self) -> bool {
        matches!(self, Term::Pending)
    }

    /// The bound value, or an error if the parameter was never supplied.
    pub fn value(&self) -> Result<&Value> {
        match self {
            Term::Bound(v) => Ok(v),
            Term::Pending => Err(Error::invalid(
                "Cannot execute a statement with unbound parameters",
            )),
        }
    }
}

/// Relational operator carried by a [`Comparator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl CmpOp {
    /// Whether a comparison outcome satisfies this operator.
    pub fn admits(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ge => ord != Ordering::Less,
            CmpOp::Gt => ord == Ordering::Greater,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Eq => "=",
            CmpOp::Ge => ">=",
            CmpOp::Gt => ">",
        };
        write!(f, "{s}")
    }
}

/// A deferred relational predicate (`column OP value`), usable as a filter
/// value inside a statement. `columns` and `values` are parallel; a length
/// greater than one represents a parenthesized column tuple such as
/// `(ck1, ck2) >= (5, ?)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: CmpOp,
    pub columns: Vec<String>,
    pub values: Vec<Term>,
}

impl Comparator {
    pub fn new(op: CmpOp, columns: Vec<String>, values: Vec<Term>) -> Self {
        Self {
            op,
            columns,
            values,
        }
    }

    pub fn single(op: CmpOp, column: impl Into<String>, value: Term) -> Self {
        Self::new(op, vec![column.into()], vec![value])
    }

    /// Evaluate the predicate against a row.
    ///
    /// Tuples compare lexicographically left to right, short-circuiting on
    /// the first unequal pair; an exhausted tuple resolves by the operator's
    /// boundary semantics. Missing columns, unbound parameters, and
    /// incomparable value kinds all fail the predicate.
    pub fn check_against(&self, row: &Row) -> bool {
        for (column, term) in self.columns.iter().zip(self.values.iter()) {
            let expected = match term {
                Term::Bound(v) => v,
                Term::Pending => return false,
            };
            let actual = match row.get(column) {
                Some(v) => v,
                None => return false,
            };
            match actual.compare(expected) {
                Some(Ordering::Equal) => continue,
                Some(ord) => return self.op.admits(ord),
                None => return false,
            }
        }
        self.op.admits(Ordering::Equal)
    }
}

/// Counter-update direction for an [`Arithmetic`] assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Plus,
    Minus,
}

/// A deferred counter update (`column = column +/- amount`), usable as an
/// assignment value inside an UPDATE statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arithmetic {
    pub op: ArithOp,
    pub column: String,
    pub amount: Term,
}

impl Arithmetic {
    pub fn new(op: ArithOp, column: impl Into<String>, amount: Term) -> Self {
        Self {
            op,
            column: column.into(),
            amount,
        }
    }

    /// Return a new attribute map with the counter column adjusted. An
    /// absent or null counter starts from zero.
    pub fn apply(&self, row: &Row) -> Result<Row> {
        let amount = match self.amount.value()? {
            Value::Int(n) => *n,
            other => {
                return Err(Error::invalid(format!(
                    "Invalid counter delta \"{other}\" for column \"{}\"",
                    self.column
                )))
            }
        };
        let current = match row.get(&self.column) {
            None | Some(Value::Null) => 0,
            Some(Value::Int(n)) => *n,
            Some(other) => {
                return Err(Error::invalid(format!(
                    "Invalid counter value \"{other}\" in column \"{}\"",
                    self.column
                )))
            }
        };
        let next = match self.op {
            ArithOp::Plus => current.checked_add(amount),
            ArithOp::Minus => current.checked_sub(amount),
        }
        .ok_or_else(|| {
            Error::invalid(format!("Counter overflow in column \"{}\"", self.column))
        })?;
        let mut out = row.clone();
        out.insert(self.column.clone(), Value::Int(next));
        Ok(out)
    }
}
