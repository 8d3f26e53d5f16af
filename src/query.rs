use serde::{Deserialize, Serialize};

use crate::model::{Filterable, Model, Operand};

/// A scalar operand value carried by a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Literal {
    /// Convert a JSON scalar; arrays and objects are not literals.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Literal::Null),
            serde_json::Value::Bool(b) => Some(Literal::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Literal::Int)
                .or_else(|| n.as_f64().map(Literal::Float)),
            serde_json::Value::String(s) => Some(Literal::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Null => serde_json::Value::Null,
            Literal::Bool(b) => serde_json::Value::Bool(*b),
            Literal::Int(i) => serde_json::Value::Number(serde_json::Number::from(*i)),
            Literal::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Literal::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Int(i) => Some(*i as f64),
            Literal::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Literal::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Literal::Int(_) | Literal::Float(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// Text form used when comparing against JSON values extracted as text.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Literal::Null => None,
            Literal::Bool(b) => Some(b.to_string()),
            Literal::Int(i) => Some(i.to_string()),
            Literal::Float(f) => Some(f.to_string()),
            Literal::Text(s) => Some(s.clone()),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Text(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Int(value as i64)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
}

/// Executor-level condition. A `Select` holds a conjunction of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        operand: Operand,
        comparison: Comparison,
        value: Literal,
    },
    Membership {
        operand: Operand,
        values: Vec<Literal>,
        negated: bool,
    },
    /// Operand exists and is not null (or the reverse when negated).
    Presence { operand: Operand, negated: bool },
    /// Case-insensitive `LIKE` pattern with `%` and `_` wildcards.
    Pattern {
        operand: Operand,
        pattern: String,
        negated: bool,
    },
}

impl Predicate {
    pub fn operand(&self) -> &Operand {
        match self {
            Predicate::Compare { operand, .. }
            | Predicate::Membership { operand, .. }
            | Predicate::Presence { operand, .. }
            | Predicate::Pattern { operand, .. } => operand,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Parse a direction name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Some(Direction::Asc),
            "desc" => Some(Direction::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub operand: Operand,
    pub direction: Direction,
}

/// -----------------------------
/// Select plan (storage contract)
/// -----------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub model: Model,
    pub predicates: Vec<Predicate>,
    pub orderings: Vec<Ordering>,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Select {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            predicates: Vec::new(),
            orderings: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    pub fn from_model<M: Filterable>() -> Self {
        Self::new(M::MODEL)
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn filter_all(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    /// Append an ordering; earlier orderings take precedence.
    pub fn order_by(mut self, operand: Operand, direction: Direction) -> Self {
        self.orderings.push(Ordering { operand, direction });
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// The same predicates with orderings and the row window removed.
    pub fn count_query(&self) -> Self {
        Self {
            model: self.model,
            predicates: self.predicates.clone(),
            orderings: Vec::new(),
            limit: None,
            offset: 0,
        }
    }
}
