use async_trait::async_trait;
use sqlx::{
    Row, Sqlite,
    query::Query as SqlxQuery,
    sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow},
};
use tracing::debug;

use crate::{
    adapters::{
        Adapter, Record,
        sql::{Bind, Dialect, Statement, comparison_sql, is_ordering, quote_identifier},
    },
    error::Error,
    model::{FieldKind, Model, Operand},
    query::{Comparison, Direction, Literal, Select},
};

/// SQLite adapter over user-defined tables.
///
/// Column storage per field kind:
/// ```sql
/// -- integer   INTEGER
/// -- real      REAL
/// -- boolean   INTEGER (0 / 1)
/// -- text      TEXT
/// -- timestamp TEXT (RFC 3339)
/// -- uuid      TEXT (hyphenated)
/// -- json      TEXT holding a JSON document
/// ```
///
/// Nested paths are read with `json_extract`; `LIKE` is case-insensitive for
/// ASCII as SQLite implements it.
pub struct SqliteAdapter {
    pub(crate) pool: SqlitePool,
}

impl SqliteAdapter {
    /// Create a new SQLite adapter with a file-based database
    pub async fn new_file(path: &str) -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{}", path))
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create a new SQLite adapter with an in-memory database
    pub async fn new_memory() -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn bind_all<'a>(
        mut query: SqlxQuery<'a, Sqlite, SqliteArguments<'a>>,
        binds: &[Bind],
    ) -> SqlxQuery<'a, Sqlite, SqliteArguments<'a>> {
        for bind in binds {
            query = match bind {
                Bind::Bool(b) => query.bind(*b),
                Bind::Int(i) => query.bind(*i),
                Bind::Float(f) => query.bind(*f),
                Bind::Text(s) => query.bind(s.clone()),
                Bind::Keys(keys) => query.bind(json_path(keys)),
            };
        }
        query
    }

    fn map_row_to_record(model: &Model, row: SqliteRow) -> Result<Record, Error> {
        let de = |e: sqlx::Error| Error::Deserialize(e.to_string());
        let mut record = Record::new();

        for field in model.fields {
            let value = match field.kind {
                FieldKind::Integer => row
                    .try_get::<Option<i64>, _>(field.name)
                    .map_err(de)?
                    .into(),
                FieldKind::Real => row
                    .try_get::<Option<f64>, _>(field.name)
                    .map_err(de)?
                    .into(),
                FieldKind::Boolean => row
                    .try_get::<Option<bool>, _>(field.name)
                    .map_err(de)?
                    .into(),
                FieldKind::Text | FieldKind::Timestamp | FieldKind::Uuid => row
                    .try_get::<Option<String>, _>(field.name)
                    .map_err(de)?
                    .into(),
                FieldKind::Json => match row.try_get::<Option<String>, _>(field.name).map_err(de)? {
                    Some(raw) => serde_json::from_str(&raw)
                        .map_err(|e| Error::Deserialize(e.to_string()))?,
                    None => serde_json::Value::Null,
                },
            };
            record.insert(field.name.to_string(), value);
        }

        Ok(record)
    }
}

/// `$."a"."b"` for the keys `["a", "b"]`.
fn json_path(keys: &[String]) -> String {
    keys.iter().fold("$".to_string(), |path, key| {
        format!("{}.\"{}\"", path, key.replace('"', "\\\""))
    })
}

pub(crate) struct SqliteDialect;

impl SqliteDialect {
    fn operand(out: &mut Statement, operand: &Operand) -> String {
        match operand {
            Operand::Column { name, .. } => quote_identifier(name),
            Operand::Nested { column, keys } if keys.is_empty() => quote_identifier(column),
            Operand::Nested { column, keys } => {
                let column = quote_identifier(column);
                let path = out.bind(Bind::Text(json_path(keys)));
                format!("json_extract({}, {})", column, path)
            }
        }
    }

    fn value(out: &mut Statement, value: &Literal) -> String {
        match Bind::literal(value) {
            Some(bind) => out.bind(bind),
            None => "NULL".to_string(),
        }
    }
}

impl Dialect for SqliteDialect {
    const NUMBERED: bool = false;
    const UNBOUNDED_LIMIT: Option<&'static str> = Some("LIMIT -1");

    fn compare(
        out: &mut Statement,
        operand: &Operand,
        comparison: Comparison,
        value: &Literal,
    ) -> String {
        let expr = Self::operand(out, operand);
        let op = comparison_sql(comparison);

        match value.as_f64() {
            Some(number) if is_ordering(comparison) => {
                format!("CAST({} AS REAL) {} {}", expr, op, out.bind(Bind::Float(number)))
            }
            _ => format!("{} {} {}", expr, op, Self::value(out, value)),
        }
    }

    fn membership(out: &mut Statement, operand: &Operand, values: &[Literal]) -> String {
        let expr = Self::operand(out, operand);
        let placeholders: Vec<String> = values.iter().map(|v| Self::value(out, v)).collect();
        format!("{} IN ({})", expr, placeholders.join(", "))
    }

    fn presence(out: &mut Statement, operand: &Operand) -> String {
        match operand {
            Operand::Nested { column, keys } if keys.is_empty() => {
                let column = quote_identifier(column);
                format!("({} IS NOT NULL AND {} != 'null')", column, column)
            }
            _ => format!("{} IS NOT NULL", Self::operand(out, operand)),
        }
    }

    fn pattern(out: &mut Statement, operand: &Operand, pattern: &str) -> String {
        let expr = Self::operand(out, operand);
        format!("{} LIKE {}", expr, out.bind(Bind::Text(pattern.to_string())))
    }

    fn ordering(out: &mut Statement, operand: &Operand, direction: Direction) -> String {
        format!("{} {}", Self::operand(out, operand), direction.as_sql())
    }
}

#[async_trait]
impl Adapter for SqliteAdapter {
    async fn fetch(&self, select: &Select) -> Result<Vec<Record>, Error> {
        let statement = SqliteDialect::render_select(select);
        debug!(sql = %statement.sql, binds = statement.binds.len(), "sqlite fetch");

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
        let statement = SqliteDialect::render_count(select);
        debug!(sql = %statement.sql, binds = statement.binds.len(), "sqlite count");

        let query = Self::bind_all(sqlx::query(&statement.sql), &statement.binds);
        let row = query
            .fetch_one(&self.pool)
            .await
            .map_err(|err| Error::Storage(err.to_string()))?;

        let count: i64 = row
            .try_get(0)
            .map_err(|e| Error::Deserialize(e.to_string()))?;
        Ok(count as u64)
    }
}
