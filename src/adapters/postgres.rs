use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{
    PgPool, Postgres, Row,
    postgres::{PgArguments, PgRow},
    query::Query as PgQuery,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    adapters::{
        Adapter, Record,
        sql::{
            Bind, Dialect, Statement, comparison_sql, is_numeric, is_ordering, quote_identifier,
        },
    },
    error::Error,
    model::{FieldKind, Model, Operand},
    query::{Comparison, Direction, Literal, Select},
};

/// PostgreSQL adapter over user-defined tables.
///
/// JSON fields are expected in `JSONB` columns. Nested paths are read as text
/// with `#>>`, patterns use `ILIKE`, and ascending orderings put NULLs first
/// so results line up with the SQLite adapter.
pub struct PostgresAdapter {
    pub(crate) pool: PgPool,
}

impl PostgresAdapter {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn bind_all<'a>(
        mut query: PgQuery<'a, Postgres, PgArguments>,
        binds: &[Bind],
    ) -> PgQuery<'a, Postgres, PgArguments> {
        for bind in binds {
            query = match bind {
                Bind::Bool(b) => query.bind(*b),
                Bind::Int(i) => query.bind(*i),
                Bind::Float(f) => query.bind(*f),
                Bind::Text(s) => query.bind(s.clone()),
                Bind::Keys(keys) => query.bind(keys.clone()),
            };
        }
        query
    }

    fn map_row_to_record(model: &Model, row: PgRow) -> Result<Record, Error> {
        let mut record = Record::new();

        for field in model.fields {
            let name = field.name;
            let value = match field.kind {
                FieldKind::Integer => decode_integer(&row, name)?,
                FieldKind::Real => decode_real(&row, name)?,
                FieldKind::Boolean => row.try_get::<Option<bool>, _>(name).map_err(de)?.into(),
                FieldKind::Text => row.try_get::<Option<String>, _>(name).map_err(de)?.into(),
                FieldKind::Timestamp => decode_timestamp(&row, name)?,
                FieldKind::Uuid => row
                    .try_get::<Option<Uuid>, _>(name)
                    .map_err(de)?
                    .map(|id| id.to_string())
                    .into(),
                FieldKind::Json => row
                    .try_get::<Option<serde_json::Value>, _>(name)
                    .map_err(de)?
                    .unwrap_or(serde_json::Value::Null),
            };
            record.insert(name.to_string(), value);
        }

        Ok(record)
    }
}

fn de(e: sqlx::Error) -> Error {
    Error::Deserialize(e.to_string())
}

/// INT8, INT4 and INT2 columns all decode into a JSON integer.
fn decode_integer(row: &PgRow, name: &str) -> Result<serde_json::Value, Error> {
    if let Ok(value) = row.try_get::<Option<i64>, _>(name) {
        return Ok(value.into());
    }
    if let Ok(value) = row.try_get::<Option<i32>, _>(name) {
        return Ok(value.into());
    }
    Ok(row.try_get::<Option<i16>, _>(name).map_err(de)?.into())
}

fn decode_real(row: &PgRow, name: &str) -> Result<serde_json::Value, Error> {
    if let Ok(value) = row.try_get::<Option<f64>, _>(name) {
        return Ok(value.into());
    }
    Ok(row.try_get::<Option<f32>, _>(name).map_err(de)?.into())
}

fn decode_timestamp(row: &PgRow, name: &str) -> Result<serde_json::Value, Error> {
    if let Ok(value) = row.try_get::<Option<DateTime<Utc>>, _>(name) {
        return Ok(value.map(|ts| ts.to_rfc3339()).into());
    }
    Ok(row
        .try_get::<Option<NaiveDateTime>, _>(name)
        .map_err(de)?
        .map(|ts| ts.and_utc().to_rfc3339())
        .into())
}

pub(crate) struct PostgresDialect;

impl PostgresDialect {
    /// Nested operands as text.
    fn nested(out: &mut Statement, column: &str, keys: &[String]) -> String {
        let column = quote_identifier(column);
        let path = out.bind(Bind::Keys(keys.to_vec()));
        format!("({} #>> {})", column, path)
    }

    /// Whether `value` compares against a `kind` column without casts.
    /// `0` and `1` stand for booleans, as SQLite stores them.
    fn native(kind: FieldKind, value: &Literal) -> bool {
        match value {
            Literal::Null => true,
            Literal::Bool(_) => kind == FieldKind::Boolean,
            Literal::Int(0 | 1) if kind == FieldKind::Boolean => true,
            Literal::Int(_) | Literal::Float(_) => is_numeric(kind),
            Literal::Text(_) => matches!(
                kind,
                FieldKind::Text | FieldKind::Timestamp | FieldKind::Uuid
            ),
        }
    }

    fn native_value(out: &mut Statement, kind: FieldKind, value: &Literal) -> String {
        let bind = match (kind, value) {
            (FieldKind::Boolean, Literal::Int(i)) => Some(Bind::Bool(*i != 0)),
            _ => Bind::literal(value),
        };
        let Some(bind) = bind else {
            return "NULL".to_string();
        };
        let placeholder = out.bind(bind);
        match (kind, value) {
            (FieldKind::Timestamp, Literal::Text(_)) => {
                format!("CAST({} AS TIMESTAMPTZ)", placeholder)
            }
            (FieldKind::Uuid, Literal::Text(_)) => format!("CAST({} AS UUID)", placeholder),
            _ => placeholder,
        }
    }

    fn text_value(out: &mut Statement, value: &Literal) -> String {
        match Bind::text(value) {
            Some(bind) => out.bind(bind),
            None => "NULL".to_string(),
        }
    }

    /// Render `operand` and its values, falling back to text comparison when
    /// the column type and the literals disagree.
    fn operand_values(
        out: &mut Statement,
        operand: &Operand,
        values: &[Literal],
    ) -> (String, Vec<String>) {
        match operand {
            Operand::Nested { column, keys } => {
                let expr = Self::nested(out, column, keys);
                let values = values.iter().map(|v| Self::text_value(out, v)).collect();
                (expr, values)
            }
            Operand::Column { name, kind } => {
                let column = quote_identifier(name);
                if values.iter().all(|v| Self::native(*kind, v)) {
                    let values = values
                        .iter()
                        .map(|v| Self::native_value(out, *kind, v))
                        .collect();
                    (column, values)
                } else {
                    let values = values.iter().map(|v| Self::text_value(out, v)).collect();
                    (format!("CAST({} AS TEXT)", column), values)
                }
            }
        }
    }
}

impl Dialect for PostgresDialect {
    const NUMBERED: bool = true;
    const UNBOUNDED_LIMIT: Option<&'static str> = None;

    fn compare(
        out: &mut Statement,
        operand: &Operand,
        comparison: Comparison,
        value: &Literal,
    ) -> String {
        let op = comparison_sql(comparison);

        if let Some(number) = value.as_f64().filter(|_| is_ordering(comparison)) {
            let expr = match operand {
                Operand::Column { name, .. } => quote_identifier(name),
                Operand::Nested { column, keys } => Self::nested(out, column, keys),
            };
            return format!(
                "CAST({} AS DOUBLE PRECISION) {} {}",
                expr,
                op,
                out.bind(Bind::Float(number))
            );
        }

        let (expr, values) = Self::operand_values(out, operand, std::slice::from_ref(value));
        format!("{} {} {}", expr, op, values.join(""))
    }

    fn membership(out: &mut Statement, operand: &Operand, values: &[Literal]) -> String {
        let (expr, values) = Self::operand_values(out, operand, values);
        format!("{} IN ({})", expr, values.join(", "))
    }

    fn presence(out: &mut Statement, operand: &Operand) -> String {
        match operand {
            Operand::Column { name, .. } => format!("{} IS NOT NULL", quote_identifier(name)),
            Operand::Nested { column, keys } if keys.is_empty() => {
                let column = quote_identifier(column);
                format!("({} IS NOT NULL AND {} != 'null'::jsonb)", column, column)
            }
            Operand::Nested { column, keys } => {
                format!("{} IS NOT NULL", Self::nested(out, column, keys))
            }
        }
    }

    fn pattern(out: &mut Statement, operand: &Operand, pattern: &str) -> String {
        let expr = match operand {
            Operand::Column {
                name,
                kind: FieldKind::Text,
            } => quote_identifier(name),
            Operand::Column { name, .. } => format!("CAST({} AS TEXT)", quote_identifier(name)),
            Operand::Nested { column, keys } => Self::nested(out, column, keys),
        };
        format!("{} ILIKE {}", expr, out.bind(Bind::Text(pattern.to_string())))
    }

    fn ordering(out: &mut Statement, operand: &Operand, direction: Direction) -> String {
        let expr = match operand {
            Operand::Column { name, .. } => quote_identifier(name),
            Operand::Nested { column, keys } => {
                let column = quote_identifier(column);
                format!("({} #> {})", column, out.bind(Bind::Keys(keys.clone())))
            }
        };
        let nulls = match direction {
            Direction::Asc => "NULLS FIRST",
            Direction::Desc => "NULLS LAST",
        };
        format!("{} {} {}", expr, direction.as_sql(), nulls)
    }
}

#[async_trait]
impl Adapter for PostgresAdapter {
    async fn fetch(&self, select: &Select) -> Result<Vec<Record>, Error> {
        let statement = PostgresDialect::render_select(select);
        debug!(sql = %statement.sql, binds = statement.binds.len(), "postgres fetch");

        let query = Self::bind_all(sqlx::query(&statement.sql), &statement.binds);
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|err| Error::Storage(err.to_string()))?;

        rows.into_iter()
            .map(|row| Self::map_row_to_record(&select.model, row))
            .collect()
    }

    async fn count(&self, select: &Select) -> Result<u64, Error> {
        let statement = PostgresDialect::render_count(select);
        debug!(sql = %statement.sql, binds = statement.binds.len(), "postgres count");

        let query = Self::bind_all(sqlx::query(&statement.sql), &statement.binds);
        let row = query
            .fetch_one(&self.pool)
            .await
            .map_err(|err| Error::Storage(err.to_string()))?;

        let count: i64 = row.try_get(0).map_err(de)?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        filters::Filters,
        model::{Filterable, tests::Person},
        sorters::Sorters,
    };
    use serde_json::json;

    fn render(filters: serde_json::Value) -> Statement {
        let filters: Filters = serde_json::from_value(filters).unwrap();
        let select = filters.bind(Select::from_model::<Person>()).unwrap();
        PostgresDialect::render_count(&select)
    }

    #[test]
    fn test_render_nested_equality_as_text() {
        let statement = render(json!({"data.inner.age": {"$eq": 30}}));
        assert_eq!(
            statement.sql,
            "SELECT COUNT(*) FROM \"people\" WHERE (\"data\" #>> $1) = $2"
        );
        assert_eq!(
            statement.binds,
            vec![
                Bind::Keys(vec!["inner".into(), "age".into()]),
                Bind::Text("30".into()),
            ]
        );
    }

    #[test]
    fn test_render_numeric_bounds() {
        let statement = render(json!({"data.age": {"$gt": 18}}));
        assert_eq!(
            statement.sql,
            "SELECT COUNT(*) FROM \"people\" WHERE CAST((\"data\" #>> $1) AS DOUBLE PRECISION) > $2"
        );
    }

    #[test]
    fn test_render_mismatched_literal_casts_column() {
        let statement = render(json!({"age": {"$in": [1, "2"]}, "name": {"$like": "a%"}}));
        assert_eq!(
            statement.sql,
            "SELECT COUNT(*) FROM \"people\" WHERE CAST(\"age\" AS TEXT) IN ($1, $2) AND \"name\" ILIKE $3"
        );
        assert_eq!(
            statement.binds,
            vec![
                Bind::Text("1".into()),
                Bind::Text("2".into()),
                Bind::Text("a%".into()),
            ]
        );
    }

    #[test]
    fn test_render_boolean_from_integer() {
        use crate::model::{Field, Model};

        const FLAGS: Model = Model {
            table: "flags",
            primary_key: "id",
            fields: &[
                Field::new("id", FieldKind::Integer),
                Field::new("active", FieldKind::Boolean),
            ],
        };

        let filters: Filters = serde_json::from_value(json!({
            "active": {"$eq": 1, "$in": [0, true]}
        }))
        .unwrap();
        let select = filters.bind(Select::new(FLAGS)).unwrap();
        let statement = PostgresDialect::render_count(&select);

        assert_eq!(
            statement.sql,
            "SELECT COUNT(*) FROM \"flags\" WHERE \"active\" = $1 AND \"active\" IN ($2, $3)"
        );
        assert_eq!(
            statement.binds,
            vec![Bind::Bool(true), Bind::Bool(false), Bind::Bool(true)]
        );

        let filters = Filters::new().with("active", "$eq", json!(2));
        let select = filters.bind(Select::new(FLAGS)).unwrap();
        let statement = PostgresDialect::render_count(&select);
        assert!(statement.sql.contains("CAST(\"active\" AS TEXT) = $1"));
    }

    #[test]
    fn test_render_select_orderings() {
        let select = Sorters::default()
            .resolve_all(
                Person::model(),
                Select::from_model::<Person>(),
                ["name", "_pk:desc"],
            )
            .with_limit(25);
        let statement = PostgresDialect::render_select(&select);
        assert_eq!(
            statement.sql,
            "SELECT \"id\", \"age\", \"name\", \"data\" FROM \"people\" ORDER BY \"name\" ASC NULLS FIRST, \"id\" DESC NULLS LAST LIMIT $1"
        );
    }
}
