#[cfg(test)]
use super::*;
#[cfg(test)]
use filterables::{
    Adapter, Engine, Error, Filters, Paginator, Sorters,
    adapters::sqlite::SqliteAdapter,
};
#[cfg(test)]
use serde_json::Value;

#[cfg(test)]
async fn init_schema(adapter: &SqliteAdapter) {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS people (
            id INTEGER PRIMARY KEY,
            age INTEGER,
            name TEXT NOT NULL,
            active BOOLEAN NOT NULL,
            data TEXT
        )
        "#,
    )
    .execute(adapter.pool())
    .await
    .unwrap();
}

#[cfg(test)]
async fn seed(adapter: &SqliteAdapter, people: &[Person]) {
    for person in people {
        sqlx::query("INSERT INTO people (id, age, name, active, data) VALUES (?, ?, ?, ?, ?)")
            .bind(person.id)
            .bind(person.age)
            .bind(&person.name)
            .bind(person.active)
            .bind(person.data.to_string())
            .execute(adapter.pool())
            .await
            .unwrap();
    }
}

#[cfg(test)]
async fn setup() -> (Engine, Vec<Person>) {
    let adapter = SqliteAdapter::new_memory().await.unwrap();
    init_schema(&adapter).await;

    let people = people();
    seed(&adapter, &people).await;

    (Engine::new(Box::new(adapter)), people)
}

#[cfg(test)]
async fn ids(engine: &Engine, filters: Value) -> Vec<i64> {
    let filters: Filters = serde_json::from_value(filters).unwrap();
    let paginator = Paginator::new(100, 0);
    let page = engine
        .paginate::<Person>(&paginator, Some(&filters))
        .await
        .unwrap();
    page.results()
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_paginate_between_descending() {
    let (engine, people) = setup().await;

    let filters = Filters::parse(r#"{"age": {"$gt": 9, "$lt": 50}}"#).unwrap();
    let paginator = Paginator::default().sort_by(["age:desc"]);

    let page = engine
        .paginate::<Person>(&paginator, Some(&filters))
        .await
        .unwrap();

    let qualifying = people
        .iter()
        .filter(|p| p.age.is_some_and(|age| age > 9 && age < 50))
        .count() as u64;
    assert_eq!(page.count(), qualifying);
    assert_eq!(page.results().len(), 25);

    let ages: Vec<i64> = page
        .results()
        .iter()
        .map(|row| row["age"].as_i64().unwrap())
        .collect();
    let max = people
        .iter()
        .filter_map(|p| p.age)
        .filter(|age| *age > 9 && *age < 50)
        .max()
        .unwrap();
    assert_eq!(ages[0], max);
    assert!(ages.windows(2).all(|pair| pair[0] > pair[1]));
}

#[tokio::test]
async fn test_count_is_independent_of_window() {
    let (engine, _) = setup().await;
    let filters = Filters::new().with("active", "$eq", serde_json::json!(true));

    for (offset, expected) in [(0, 25), (25, 25), (40, 10), (50, 0), (500, 0)] {
        let page = engine
            .paginate::<Person>(&Paginator::new(25, offset), Some(&filters))
            .await
            .unwrap();
        assert_eq!(page.count(), 50);
        assert_eq!(page.results().len(), expected);
    }
}

#[tokio::test]
async fn test_operators() {
    let (engine, people) = setup().await;

    assert_eq!(
        ids(&engine, serde_json::json!({"age": {"$eq": 37}})).await,
        expected_ids(&people, |p| p.age == Some(37))
    );
    assert_eq!(
        ids(&engine, serde_json::json!({"age": {"$ne": 37}})).await,
        expected_ids(&people, |p| p.age.is_some_and(|age| age != 37))
    );
    assert_eq!(
        ids(&engine, serde_json::json!({"age": {"$in": [1, 2, 3]}})).await,
        expected_ids(&people, |p| matches!(p.age, Some(1..=3)))
    );
    assert_eq!(
        ids(&engine, serde_json::json!({"age": {"$nin": [1, 2, 3]}})).await,
        expected_ids(&people, |p| p.age.is_some_and(|age| !(1..=3).contains(&age)))
    );
    assert_eq!(
        ids(&engine, serde_json::json!({"age": {"$has": false}})).await,
        expected_ids(&people, |p| p.age.is_none())
    );
    assert_eq!(
        ids(&engine, serde_json::json!({"name": {"$like": "person-1%"}})).await,
        expected_ids(&people, |p| p.name.starts_with("Person-1"))
    );
    assert_eq!(
        ids(&engine, serde_json::json!({"name": {"$unlike": "%0"}})).await,
        expected_ids(&people, |p| !p.name.ends_with('0'))
    );
}

#[tokio::test]
async fn test_nested_paths() {
    let (engine, people) = setup().await;

    let nested = ids(&engine, serde_json::json!({"data.age": {"$gt": 89}})).await;
    assert_eq!(
        nested,
        expected_ids(&people, |p| p.data["age"].as_i64().unwrap() > 89)
    );

    let city = ids(
        &engine,
        serde_json::json!({"data.profile.city": {"$in": ["Oslo", "Kyiv"]}}),
    )
    .await;
    assert_eq!(city, expected_ids(&people, |p| p.id % 4 == 0 || p.id % 4 == 3));

    let pattern = ids(&engine, serde_json::json!({"data.profile.city": {"$like": "p%"}})).await;
    assert_eq!(pattern, expected_ids(&people, |p| p.id % 4 == 2));

    assert!(
        ids(&engine, serde_json::json!({"data.profile.zip": {"$has": true}}))
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_nested_matches_direct_column() {
    let (engine, _) = setup().await;

    let direct = ids(&engine, serde_json::json!({"age": {"$eq": 31}})).await;
    let nested = ids(&engine, serde_json::json!({"data.age": {"$eq": 31}})).await;
    assert_eq!(direct.len(), 1);
    assert_eq!(direct, nested);
}

#[tokio::test]
async fn test_inverted_range_is_empty() {
    let (engine, _) = setup().await;
    let filters = Filters::parse(r#"{"age": {"$gt": 60, "$lt": 40}}"#).unwrap();

    let page = engine
        .paginate::<Person>(&Paginator::default(), Some(&filters))
        .await
        .unwrap();
    assert_eq!(page.count(), 0);
    assert!(page.results().is_empty());
}

#[tokio::test]
async fn test_excludes_and_typed_results() {
    let (engine, _) = setup().await;
    let paginator = Paginator::new(5, 0).exclude(["age", "data.profile"]);

    let page = engine.paginate::<Person>(&paginator, None).await.unwrap();
    assert_eq!(page.count(), 100);

    let results: Vec<Person> = page.results_as().unwrap();
    let ids: Vec<i64> = results.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    for person in results {
        assert_eq!(person.age, None);
        assert!(person.data.get("profile").is_none());
        assert!(person.data.get("age").is_some());
    }
}

#[tokio::test]
async fn test_custom_sorter_runs_first() {
    let adapter = SqliteAdapter::new_memory().await.unwrap();
    init_schema(&adapter).await;
    seed(&adapter, &people()).await;

    let engine = Engine::with_sorters(Box::new(adapter), Sorters::default().with(UnderscoreSorter));
    let paginator = Paginator::new(3, 0).sort_by(["active_desc", "id:desc"]);

    let page = engine.paginate::<Person>(&paginator, None).await.unwrap();
    let ids: Vec<_> = page.results().iter().map(|row| row["id"].clone()).collect();
    assert_eq!(ids, vec![serde_json::json!(98), serde_json::json!(96), serde_json::json!(94)]);
}

#[tokio::test]
async fn test_validation_errors() {
    let (engine, _) = setup().await;

    let filters = Filters::parse(r#"{"age.years": {"$eq": 1}}"#).unwrap();
    let err = engine
        .paginate::<Person>(&Paginator::default(), Some(&filters))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPath { .. }));

    let filters = Filters::parse(r#"{"age": {"$gte": 1}}"#).unwrap();
    let err = engine
        .paginate::<Person>(&Paginator::default(), Some(&filters))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownOperator { .. }));
}

#[tokio::test]
async fn test_storage_errors_pass_through() {
    let adapter = SqliteAdapter::new_memory().await.unwrap();
    let select = filterables::Select::from_model::<Person>();

    let err = adapter.count(&select).await.unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert!(!err.is_validation());
}

#[tokio::test]
async fn test_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.db");
    std::fs::File::create(&path).unwrap();

    let adapter = SqliteAdapter::new_file(path.to_str().unwrap()).await.unwrap();
    init_schema(&adapter).await;
    seed(&adapter, &people()[..10]).await;

    let engine = Engine::new(Box::new(adapter));
    assert_eq!(engine.count::<Person>(None).await.unwrap(), 10);
}

#[tokio::test]
async fn test_offset_past_end_is_empty() {
    let (engine, _) = setup().await;

    let paginator: Paginator =
        serde_json::from_value(serde_json::json!({"limit": 5, "offset": u64::MAX})).unwrap();
    let page = engine.paginate::<Person>(&paginator, None).await.unwrap();
    assert_eq!(page.count(), 100);
    assert!(page.results().is_empty());

    let page = engine
        .paginate::<Person>(&Paginator::new(u64::MAX, 98), None)
        .await
        .unwrap();
    assert_eq!(page.results().len(), 2);
}

#[tokio::test]
async fn test_three_level_nested_path() {
    let (engine, people) = setup().await;

    let deep = ids(&engine, serde_json::json!({"data.inner.inner.age": {"$gt": 18, "$lt": 35}})).await;
    assert_eq!(
        deep,
        expected_ids(&people, |p| {
            let age = p.data["age"].as_i64().unwrap();
            age > 18 && age < 35
        })
    );
    assert_eq!(deep.len(), 16);

    assert_eq!(
        ids(&engine, serde_json::json!({"data.inner.inner.age": {"$eq": 31}})).await,
        ids(&engine, serde_json::json!({"age": {"$eq": 31}})).await
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_engine_across_tasks() {
    let (engine, _) = setup().await;

    let tasks: Vec<_> = (0..8u64)
        .map(|page| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let filters = Filters::new().with("active", "$eq", serde_json::json!(true));
                let paginator = Paginator::new(10, page * 10).sort_by(["id:desc"]);
                engine.paginate::<Person>(&paginator, Some(&filters)).await
            })
        })
        .collect();

    let mut seen = Vec::new();
    for task in tasks {
        let page = task.await.unwrap().unwrap();
        assert_eq!(page.count(), 50);
        seen.extend(page.results().iter().map(|row| row["id"].as_i64().unwrap()));
    }

    seen.sort();
    assert_eq!(seen, (0..100).step_by(2).collect::<Vec<_>>());
}
