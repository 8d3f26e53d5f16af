use std::{cmp::Ordering as CmpOrdering, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    adapters::{Adapter, Record},
    error::Error,
    query::{Comparison, Direction, Literal, Ordering, Predicate, Select},
};

/// In-process adapter evaluating plans over JSON rows.
///
/// Follows the SQLite adapter's rules: missing values and NULLs fail every
/// comparison, numeric bounds compare as reals, patterns ignore case and
/// NULLs sort first.
#[derive(Clone, Default)]
pub struct MemoryAdapter {
    tables: Arc<RwLock<HashMap<String, Vec<Record>>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row; non-object values are rejected.
    pub async fn insert(&self, table: &str, row: Value) -> Result<(), Error> {
        let Value::Object(record) = row else {
            return Err(Error::Deserialize(format!(
                "rows for '{}' must be JSON objects",
                table
            )));
        };

        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    pub async fn insert_all(
        &self,
        table: &str,
        rows: impl IntoIterator<Item = Value>,
    ) -> Result<(), Error> {
        for row in rows {
            self.insert(table, row).await?;
        }
        Ok(())
    }

    pub async fn len(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map_or(0, Vec::len)
    }

    pub async fn is_empty(&self, table: &str) -> bool {
        self.len(table).await == 0
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

/// Numeric view of a stored value, as `CAST(x AS REAL)` reads it.
fn as_real(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => u8::from(*b).to_string(),
        other => other.to_string(),
    }
}

fn equals(value: &Value, literal: &Literal) -> bool {
    match (value, literal) {
        (_, Literal::Null) => false,
        (Value::Number(_) | Value::Bool(_), Literal::Int(_) | Literal::Float(_)) => {
            literal.as_f64() == Some(as_real(value))
        }
        (Value::Number(_) | Value::Bool(_), Literal::Bool(b)) => {
            as_real(value) == f64::from(u8::from(*b))
        }
        (Value::String(s), Literal::Text(t)) => s == t,
        _ => false,
    }
}

fn compare(value: &Value, comparison: Comparison, literal: &Literal) -> bool {
    match comparison {
        Comparison::Equal => equals(value, literal),
        Comparison::NotEqual => !literal.is_null() && !equals(value, literal),
        Comparison::GreaterThan | Comparison::LessThan => {
            let ordering = match (literal.as_f64(), literal.as_text(), value) {
                (Some(bound), _, _) => as_real(value).partial_cmp(&bound),
                (None, Some(bound), Value::String(s)) => Some(s.as_str().cmp(bound)),
                _ => None,
            };
            match comparison {
                Comparison::GreaterThan => ordering == Some(CmpOrdering::Greater),
                _ => ordering == Some(CmpOrdering::Less),
            }
        }
    }
}

/// Case-insensitive `LIKE` with `%` and `_` wildcards.
fn like(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    let (mut v, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while v < value.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, v));
                p += 1;
            }
            Some('_') => {
                v += 1;
                p += 1;
            }
            Some(c) if *c == value[v] => {
                v += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    v = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}

fn matches(record: &Record, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Compare {
            operand,
            comparison,
            value,
        } => present(operand.lookup(record))
            .is_some_and(|stored| compare(stored, *comparison, value)),
        Predicate::Membership {
            operand,
            values,
            negated,
        } => present(operand.lookup(record)).is_some_and(|stored| {
            if values.iter().any(|value| equals(stored, value)) {
                return !*negated;
            }
            // `x NOT IN (.., NULL)` is never true
            *negated && !values.iter().any(Literal::is_null)
        }),
        Predicate::Presence { operand, negated } => {
            present(operand.lookup(record)).is_some() != *negated
        }
        Predicate::Pattern {
            operand,
            pattern,
            negated,
        } => present(operand.lookup(record))
            .is_some_and(|stored| like(&as_text(stored), pattern) != *negated),
    }
}

/// NULL < numbers < text < documents, as SQLite orders mixed values.
fn order_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_) | Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(_) => 3,
        }
    }

    let (left, right) = (rank(a), rank(b));
    if left != right {
        return left.cmp(&right);
    }

    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(a), Some(b)) if left == 1 => as_real(a).total_cmp(&as_real(b)),
        (Some(a), Some(b)) if left == 3 => a.to_string().cmp(&b.to_string()),
        _ => CmpOrdering::Equal,
    }
}

fn order_records(a: &Record, b: &Record, orderings: &[Ordering]) -> CmpOrdering {
    for Ordering { operand, direction } in orderings {
        let ordering = order_values(operand.lookup(a), operand.lookup(b));
        let ordering = match direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != CmpOrdering::Equal {
            return ordering;
        }
    }
    CmpOrdering::Equal
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn fetch(&self, select: &Select) -> Result<Vec<Record>, Error> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(select.model.table) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<&Record> = rows
            .iter()
            .filter(|row| select.predicates.iter().all(|p| matches(row, p)))
            .collect();

        rows.sort_by(|a, b| order_records(a, b, &select.orderings));

        let limit = select
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));
        let offset = usize::try_from(select.offset).unwrap_or(usize::MAX);
        let records = rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| {
                select
                    .model
                    .fields
                    .iter()
                    .map(|field| {
                        let value = row.get(field.name).cloned().unwrap_or(Value::Null);
                        (field.name.to_string(), value)
                    })
                    .collect()
            })
            .collect();

        Ok(records)
    }

    async fn count(&self, select: &Select) -> Result<u64, Error> {
        let tables = self.tables.read().await;
        let count = tables.get(select.model.table).map_or(0, |rows| {
            rows.iter()
                .filter(|row| select.predicates.iter().all(|p| matches(row, p)))
                .count()
        });
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        filters::Filters,
        model::{Filterable, tests::Person},
    };
    use serde_json::json;

    async fn people() -> MemoryAdapter {
        let adapter = MemoryAdapter::new();
        adapter
            .insert_all(
                "people",
                [
                    json!({"id": 1, "age": 20, "name": "Alec", "data": {"age": 30, "tags": ["a"]}}),
                    json!({"id": 2, "age": 35, "name": "bob", "data": {"age": 41}}),
                    json!({"id": 3, "age": null, "name": "Carla", "data": null}),
                    json!({"id": 4, "age": 50, "name": "alice", "data": {"inner": {"age": 30}}}),
                ],
            )
            .await
            .unwrap();
        adapter
    }

    async fn ids(adapter: &MemoryAdapter, filters: Value) -> Vec<i64> {
        let filters: Filters = serde_json::from_value(filters).unwrap();
        let select = filters.bind(Select::from_model::<Person>()).unwrap();
        adapter
            .fetch(&select)
            .await
            .unwrap()
            .iter()
            .map(|row| row["id"].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_like() {
        assert!(like("Alec", "a%"));
        assert!(like("alice", "A_I%"));
        assert!(like("abcabd", "%ab_"));
        assert!(like("", "%"));
        assert!(!like("bob", "a%"));
        assert!(!like("alec", "a_c"));
    }

    #[tokio::test]
    async fn test_insert_rejects_non_objects() {
        let adapter = MemoryAdapter::new();
        assert!(adapter.insert("people", json!([1, 2])).await.is_err());
        assert!(adapter.is_empty("people").await);
    }

    #[tokio::test]
    async fn test_operators() {
        let adapter = people().await;

        assert_eq!(ids(&adapter, json!({"age": {"$eq": 35}})).await, vec![2]);
        assert_eq!(ids(&adapter, json!({"age": {"$ne": 35}})).await, vec![1, 4]);
        assert_eq!(ids(&adapter, json!({"age": {"$in": [20, 50]}})).await, vec![1, 4]);
        assert_eq!(ids(&adapter, json!({"age": {"$nin": [20]}})).await, vec![2, 4]);
        assert_eq!(ids(&adapter, json!({"age": {"$gt": 20}})).await, vec![2, 4]);
        assert_eq!(ids(&adapter, json!({"age": {"$lt": 35.5}})).await, vec![1, 2]);
        assert_eq!(ids(&adapter, json!({"age": {"$has": false}})).await, vec![3]);
        assert_eq!(ids(&adapter, json!({"name": {"$like": "al%"}})).await, vec![1, 4]);
        assert_eq!(ids(&adapter, json!({"name": {"$unlike": "al%"}})).await, vec![2, 3]);
        assert_eq!(ids(&adapter, json!({"name": {"$gt": "b"}})).await, vec![2]);
    }

    #[tokio::test]
    async fn test_null_membership() {
        let adapter = people().await;

        assert!(ids(&adapter, json!({"age": {"$nin": [20, null]}})).await.is_empty());
        assert_eq!(ids(&adapter, json!({"age": {"$in": [20, null]}})).await, vec![1]);
        assert!(ids(&adapter, json!({"age": {"$in": [null]}})).await.is_empty());
    }

    #[tokio::test]
    async fn test_inverted_between_matches_nothing() {
        let adapter = people().await;
        assert!(ids(&adapter, json!({"age": {"$gt": 40, "$lt": 20}})).await.is_empty());
        assert_eq!(ids(&adapter, json!({"age": {"$gt": 19, "$lt": 36}})).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_nested_paths() {
        let adapter = people().await;

        assert_eq!(ids(&adapter, json!({"data.age": {"$eq": 30}})).await, vec![1]);
        assert_eq!(ids(&adapter, json!({"data.inner.age": {"$eq": 30}})).await, vec![4]);
        assert_eq!(ids(&adapter, json!({"data.age": {"$has": true}})).await, vec![1, 2]);
        assert_eq!(ids(&adapter, json!({"data": {"$has": false}})).await, vec![3]);
    }

    #[tokio::test]
    async fn test_nested_matches_direct() {
        let adapter = people().await;
        let nested = ids(&adapter, json!({"data.age": {"$gt": 29, "$lt": 31}})).await;
        let direct = ids(&adapter, json!({"age": {"$gt": 19, "$lt": 21}})).await;
        assert_eq!(nested, direct);
    }

    #[tokio::test]
    async fn test_window_and_order() {
        let adapter = people().await;
        let age = Person::model().path("age").unwrap();

        let select = Select::from_model::<Person>().order_by(age.clone(), Direction::Asc);
        let rows = adapter.fetch(&select).await.unwrap();
        assert_eq!(rows[0]["age"], Value::Null);

        let select = Select::from_model::<Person>()
            .order_by(age, Direction::Desc)
            .with_offset(1)
            .with_limit(2);
        let rows = adapter.fetch(&select).await.unwrap();
        let ages: Vec<_> = rows.iter().map(|row| row["age"].clone()).collect();
        assert_eq!(ages, vec![json!(35), json!(20)]);

        assert_eq!(adapter.count(&select).await.unwrap(), 4);

        let select = Select::from_model::<Person>().with_offset(u64::MAX).with_limit(u64::MAX);
        assert!(adapter.fetch(&select).await.unwrap().is_empty());
    }
}
