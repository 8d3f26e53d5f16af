use std::time::Instant;

use metrics::histogram;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};

use crate::{
    Engine,
    adapters::Record,
    error::Error,
    filters::Filters,
    query::Select,
    sorters::PrimaryKeySorter,
};

pub const DEFAULT_LIMIT: u64 = 25;

/// Pagination parameters, usually decoded from a query string.
///
/// Accepts `sort` and `exclude` as aliases of `sorting` and `excludes`.
/// Whitespace inside sort tokens is dropped on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paginator {
    limit: u64,
    offset: u64,
    #[serde(alias = "sort", deserialize_with = "sort_tokens")]
    sorting: Vec<String>,
    #[serde(alias = "exclude", deserialize_with = "one_or_many")]
    excludes: Vec<String>,
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            sorting: vec![PrimaryKeySorter::FIELD.to_string()],
            excludes: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

fn sort_tokens<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(one_or_many(deserializer)?
        .iter()
        .map(|token| strip_whitespace(token))
        .collect())
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

impl Paginator {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit,
            offset,
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Replace the sort tokens.
    pub fn sort_by<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.sorting = tokens
            .into_iter()
            .map(|token| strip_whitespace(token.as_ref()))
            .collect();
        self
    }

    pub fn exclude<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn sorting(&self) -> &[String] {
        &self.sorting
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.limit == 0 {
            return Err(Error::InvalidParameter(
                "limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Run `select` as one page: filter, sort, count, slice, fetch, exclude.
    ///
    /// `count` covers every row matching the filters, regardless of the window.
    pub async fn exec(
        &self,
        engine: &Engine,
        select: Select,
        filters: Option<&Filters>,
    ) -> Result<Pagination, Error> {
        self.validate()?;

        let start = Instant::now();
        let model = select.model;

        let select = match filters {
            Some(filters) => filters.bind(select)?,
            None => select,
        };
        let select = engine.sorters().resolve_all(
            &model,
            select,
            self.sorting.iter().map(String::as_str),
        );

        let count = engine.adapter().count(&select.count_query()).await?;

        let page = select.with_offset(self.offset).with_limit(self.limit);
        let mut results = engine.adapter().fetch(&page).await?;
        for record in &mut results {
            self.apply_excludes(record);
        }

        histogram!("filterables.paginate.duration_ms", "table" => model.table)
            .record(start.elapsed().as_millis() as f64);

        Ok(Pagination::new(
            count,
            self.clone(),
            filters.cloned().unwrap_or_default(),
            results,
        ))
    }

    /// Null out root fields and drop nested keys named by `excludes`.
    fn apply_excludes(&self, record: &mut Record) {
        for path in &self.excludes {
            let mut segments: Vec<&str> = path.split('.').collect();
            let Some(leaf) = segments.pop() else {
                continue;
            };

            let Some((root, parents)) = segments.split_first() else {
                if let Some(value) = record.get_mut(leaf) {
                    *value = serde_json::Value::Null;
                }
                continue;
            };

            let parent = parents
                .iter()
                .try_fold(record.get_mut(*root), |value, key| {
                    Some(value?.get_mut(*key))
                })
                .flatten();

            if let Some(serde_json::Value::Object(parent)) = parent {
                parent.remove(leaf);
            }
        }
    }
}

/// Result of a paginator run. Built once, read through accessors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    count: u64,
    params: Paginator,
    filters: Filters,
    results: Vec<Record>,
}

impl Pagination {
    pub fn new(count: u64, params: Paginator, filters: Filters, results: Vec<Record>) -> Self {
        Self {
            count,
            params,
            filters,
            results,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn params(&self) -> &Paginator {
        &self.params
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn results(&self) -> &[Record] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Record> {
        self.results
    }

    /// Decode every result into `T`. Excluded root fields arrive as `null`.
    pub fn results_as<T: DeserializeOwned>(&self) -> Result<Vec<T>, Error> {
        self.results
            .iter()
            .map(|record| {
                serde_json::from_value(serde_json::Value::Object(record.clone()))
                    .map_err(|e| Error::Deserialize(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::MemoryAdapter,
        model::{Filterable, tests::Person},
    };
    use serde_json::{Value, json};

    /// 100 people aged 0..100 in shuffled id order; ages 19..=34 and
    /// 60..=83 (40 rows) sit in the two windows used below.
    async fn engine() -> Engine {
        let adapter = MemoryAdapter::new();
        for id in 0..100i64 {
            let age = (id * 37) % 100;
            adapter
                .insert(
                    "people",
                    json!({
                        "id": id,
                        "age": age,
                        "name": format!("person-{}", id),
                        "data": {"age": age, "inner": {"secret": id}},
                    }),
                )
                .await
                .unwrap();
        }
        Engine::new(Box::new(adapter))
    }

    fn ages(pagination: &Pagination) -> Vec<i64> {
        pagination
            .results()
            .iter()
            .map(|row| row["age"].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_defaults() {
        let paginator = Paginator::default();
        assert_eq!(paginator.limit(), 25);
        assert_eq!(paginator.offset(), 0);
        assert_eq!(paginator.sorting(), ["_pk"]);
        assert!(paginator.excludes().is_empty());
    }

    #[test]
    fn test_deserialize_aliases_and_whitespace() {
        let paginator: Paginator = serde_json::from_value(json!({
            "limit": 10,
            "sort": ["age : desc", " name"],
            "exclude": "data.inner",
        }))
        .unwrap();

        assert_eq!(paginator.limit(), 10);
        assert_eq!(paginator.offset(), 0);
        assert_eq!(paginator.sorting(), ["age:desc", "name"]);
        assert_eq!(paginator.excludes(), ["data.inner"]);

        let echoed = serde_json::to_value(&paginator).unwrap();
        assert_eq!(echoed["sorting"], json!(["age:desc", "name"]));
        assert_eq!(echoed["excludes"], json!(["data.inner"]));
    }

    #[test]
    fn test_validate_limit() {
        assert!(Paginator::default().validate().is_ok());
        assert!(matches!(
            Paginator::new(0, 0).validate(),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_excludes() {
        let paginator = Paginator::default().exclude(["age", "data.inner.secret", "nope", "data.x.y"]);
        let mut record = json!({
            "age": 30,
            "name": "n",
            "data": {"age": 30, "inner": {"secret": 1, "kept": 2}},
        })
        .as_object()
        .cloned()
        .unwrap();

        paginator.apply_excludes(&mut record);

        assert_eq!(
            Value::Object(record),
            json!({
                "age": null,
                "name": "n",
                "data": {"age": 30, "inner": {"kept": 2}},
            })
        );
    }

    #[tokio::test]
    async fn test_between_descending_page() {
        let engine = engine().await;
        let filters = Filters::parse(r#"{"age": {"$gt": 18, "$lt": 35}}"#).unwrap();
        let excluded = Filters::parse(r#"{"age": {"$gt": 59, "$lt": 84}}"#).unwrap();

        let paginator = Paginator::default().sort_by(["age:desc"]);
        let page = engine
            .paginate::<Person>(&paginator, Some(&filters))
            .await
            .unwrap();
        let other = engine
            .paginate::<Person>(&paginator, Some(&excluded))
            .await
            .unwrap();

        assert_eq!(page.count() + other.count(), 40);
        assert_eq!(page.count(), 16);
        assert_eq!(ages(&page), (19..35).rev().collect::<Vec<_>>());
        assert_eq!(page.filters(), &filters);
        assert_eq!(page.params(), &paginator);
    }

    #[tokio::test]
    async fn test_forty_qualifying_rows() {
        let engine = engine().await;
        let filters = Filters::parse(r#"{"age": {"$gt": 9, "$lt": 50}}"#).unwrap();
        let paginator = Paginator::default().sort_by(["age:desc"]);

        let page = engine
            .paginate::<Person>(&paginator, Some(&filters))
            .await
            .unwrap();

        assert_eq!(page.count(), 40);
        assert_eq!(page.results().len(), 25);
        let ages = ages(&page);
        assert_eq!(ages[0], 49);
        assert!(ages.windows(2).all(|pair| pair[0] > pair[1]));
    }

    #[tokio::test]
    async fn test_count_ignores_window() {
        let engine = engine().await;
        let filters = Filters::parse(r#"{"age": {"$gt": 9, "$lt": 50}}"#).unwrap();

        for (offset, expected) in [(0, 25), (25, 15), (40, 0), (90, 0)] {
            let paginator = Paginator::default().with_offset(offset);
            let page = engine
                .paginate::<Person>(&paginator, Some(&filters))
                .await
                .unwrap();
            assert_eq!(page.count(), 40);
            assert_eq!(page.results().len(), expected);
        }
    }

    #[tokio::test]
    async fn test_default_sort_is_primary_key() {
        let engine = engine().await;
        let page = engine
            .paginate::<Person>(&Paginator::new(3, 10), None)
            .await
            .unwrap();

        let ids: Vec<_> = page.results().iter().map(|row| row["id"].clone()).collect();
        assert_eq!(ids, vec![json!(10), json!(11), json!(12)]);
        assert_eq!(page.count(), 100);
        assert!(page.filters().is_empty());
    }

    #[tokio::test]
    async fn test_exclude_keeps_count() {
        let engine = engine().await;
        let paginator = Paginator::default().exclude(["age", "data.inner"]);

        let page = engine.paginate::<Person>(&paginator, None).await.unwrap();

        assert_eq!(page.count(), 100);
        for row in page.results() {
            assert_eq!(row["age"], Value::Null);
            assert!(row["data"].get("inner").is_none());
            assert!(row["data"].get("age").is_some());
        }
    }

    #[tokio::test]
    async fn test_inverted_between_is_empty() {
        let engine = engine().await;
        let filters = Filters::parse(r#"{"age": {"$gt": 50, "$lt": 10}}"#).unwrap();

        let page = engine
            .paginate::<Person>(&Paginator::default(), Some(&filters))
            .await
            .unwrap();

        assert_eq!(page.count(), 0);
        assert!(page.results().is_empty());
    }

    #[tokio::test]
    async fn test_nested_filter_and_unknown_sort() {
        let engine = engine().await;
        let filters = Filters::parse(r#"{"data.age": {"$eq": 30}}"#).unwrap();
        let paginator = Paginator::default().sort_by(["nope:desc", "data:asc"]);

        let page = engine
            .paginate::<Person>(&paginator, Some(&filters))
            .await
            .unwrap();

        assert_eq!(page.count(), 1);
        assert_eq!(ages(&page), vec![30]);
    }

    #[tokio::test]
    async fn test_validation_errors_surface() {
        let engine = engine().await;

        let filters = Filters::parse(r#"{"email": {"$eq": "x"}}"#).unwrap();
        let err = engine
            .paginate::<Person>(&Paginator::default(), Some(&filters))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = engine
            .paginate::<Person>(&Paginator::new(0, 0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn test_results_as_and_envelope_shape() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Row {
            id: i64,
            age: Option<i64>,
        }

        let engine = engine().await;
        let paginator = Paginator::new(2, 0).exclude(["age"]);
        let page = engine.paginate::<Person>(&paginator, None).await.unwrap();

        let rows: Vec<Row> = page.results_as().unwrap();
        assert_eq!(rows, vec![Row { id: 0, age: None }, Row { id: 1, age: None }]);

        let envelope = serde_json::to_value(&page).unwrap();
        assert_eq!(envelope["count"], json!(100));
        assert_eq!(envelope["params"]["limit"], json!(2));
        assert_eq!(envelope["filters"], json!({}));
        assert_eq!(envelope["results"].as_array().unwrap().len(), 2);
        assert_eq!(Person::model().table, "people");
    }
}
