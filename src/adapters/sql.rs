use crate::{
    model::{FieldKind, Operand},
    query::{Comparison, Direction, Literal, Predicate, Select},
};

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Bind {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Key chain of a nested JSON path (Postgres `text[]`).
    Keys(Vec<String>),
}

impl Bind {
    /// Bind a literal as is. Callers render `NULL` inline instead.
    pub(crate) fn literal(value: &Literal) -> Option<Self> {
        match value {
            Literal::Null => None,
            Literal::Bool(b) => Some(Bind::Bool(*b)),
            Literal::Int(i) => Some(Bind::Int(*i)),
            Literal::Float(f) => Some(Bind::Float(*f)),
            Literal::Text(s) => Some(Bind::Text(s.clone())),
        }
    }

    /// LIMIT / OFFSET value, saturating at `i64::MAX`.
    pub(crate) fn window(value: u64) -> Self {
        Bind::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }

    pub(crate) fn text(value: &Literal) -> Option<Self> {
        value.to_text().map(Bind::Text)
    }
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQL text plus the values for its placeholders, in order.
#[derive(Debug, Default)]
pub(crate) struct Statement {
    pub sql: String,
    pub binds: Vec<Bind>,
    numbered: bool,
}

impl Statement {
    pub(crate) fn new(numbered: bool) -> Self {
        Self {
            sql: String::new(),
            binds: Vec::new(),
            numbered,
        }
    }

    /// Register a bind and return its placeholder.
    pub(crate) fn bind(&mut self, value: Bind) -> String {
        self.binds.push(value);
        if self.numbered {
            format!("${}", self.binds.len())
        } else {
            "?".to_string()
        }
    }
}

/// Dialect specific rendering of operands and predicates.
///
/// Placeholders must be taken from `out` in the order they appear in the
/// returned text.
pub(crate) trait Dialect {
    const NUMBERED: bool;

    /// Clause used when an offset is given without a limit.
    const UNBOUNDED_LIMIT: Option<&'static str>;

    fn compare(
        out: &mut Statement,
        operand: &Operand,
        comparison: Comparison,
        value: &Literal,
    ) -> String;

    fn membership(out: &mut Statement, operand: &Operand, values: &[Literal]) -> String;

    fn presence(out: &mut Statement, operand: &Operand) -> String;

    fn pattern(out: &mut Statement, operand: &Operand, pattern: &str) -> String;

    fn ordering(out: &mut Statement, operand: &Operand, direction: Direction) -> String;

    fn predicate(out: &mut Statement, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Compare {
                operand,
                comparison,
                value,
            } => Self::compare(out, operand, *comparison, value),
            Predicate::Membership {
                operand,
                values,
                negated,
            } => negate(Self::membership(out, operand, values), *negated),
            Predicate::Presence { operand, negated } => {
                negate(Self::presence(out, operand), *negated)
            }
            Predicate::Pattern {
                operand,
                pattern,
                negated,
            } => negate(Self::pattern(out, operand, pattern), *negated),
        }
    }

    fn where_clause(out: &mut Statement, select: &Select) {
        if select.predicates.is_empty() {
            return;
        }

        let conditions: Vec<String> = select
            .predicates
            .iter()
            .map(|predicate| Self::predicate(out, predicate))
            .collect();

        out.sql.push_str(" WHERE ");
        out.sql.push_str(&conditions.join(" AND "));
    }

    fn render_select(select: &Select) -> Statement {
        let mut out = Statement::new(Self::NUMBERED);

        let columns: Vec<String> = select
            .model
            .fields
            .iter()
            .map(|field| quote_identifier(field.name))
            .collect();

        out.sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote_identifier(select.model.table)
        );

        Self::where_clause(&mut out, select);

        if !select.orderings.is_empty() {
            let terms: Vec<String> = select
                .orderings
                .iter()
                .map(|ordering| Self::ordering(&mut out, &ordering.operand, ordering.direction))
                .collect();
            out.sql.push_str(" ORDER BY ");
            out.sql.push_str(&terms.join(", "));
        }

        match select.limit {
            Some(limit) => {
                let placeholder = out.bind(Bind::window(limit));
                out.sql.push_str(&format!(" LIMIT {}", placeholder));
            }
            None if select.offset > 0 => {
                if let Some(clause) = Self::UNBOUNDED_LIMIT {
                    out.sql.push(' ');
                    out.sql.push_str(clause);
                }
            }
            None => {}
        }

        if select.offset > 0 {
            let placeholder = out.bind(Bind::window(select.offset));
            out.sql.push_str(&format!(" OFFSET {}", placeholder));
        }

        out
    }

    fn render_count(select: &Select) -> Statement {
        let mut out = Statement::new(Self::NUMBERED);
        out.sql = format!(
            "SELECT COUNT(*) FROM {}",
            quote_identifier(select.model.table)
        );
        Self::where_clause(&mut out, select);
        out
    }
}

fn negate(condition: String, negated: bool) -> String {
    if negated {
        format!("NOT ({})", condition)
    } else {
        condition
    }
}

/// Whether a direct column holds numbers.
pub(crate) fn is_numeric(kind: FieldKind) -> bool {
    matches!(kind, FieldKind::Integer | FieldKind::Real)
}

pub(crate) fn comparison_sql(comparison: Comparison) -> &'static str {
    match comparison {
        Comparison::Equal => "=",
        Comparison::NotEqual => "!=",
        Comparison::GreaterThan => ">",
        Comparison::LessThan => "<",
    }
}

pub(crate) fn is_ordering(comparison: Comparison) -> bool {
    matches!(comparison, Comparison::GreaterThan | Comparison::LessThan)
}
