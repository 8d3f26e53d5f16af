pub mod operator;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use operator::{Operator, OperatorSet};

use crate::{
    error::Error,
    model::Model,
    query::{Predicate, Select},
};

/// Caller supplied filter expression: `{"path": {"$op": value, ...}, ...}`.
///
/// Every operator on every path must hold; there is no disjunction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters(BTreeMap<String, OperatorSet>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the JSON form used in query strings.
    pub fn parse(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Deserialize(e.to_string()))
    }

    /// Add (or replace) one operator on a path.
    pub fn with(mut self, path: impl Into<String>, symbol: &str, value: serde_json::Value) -> Self {
        self.0
            .entry(path.into())
            .or_default()
            .insert(symbol.to_string(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OperatorSet)> {
        self.0.iter()
    }

    /// Validate operator symbols and value shapes without a model.
    pub fn operators(&self) -> Result<Vec<(&str, Vec<Operator>)>, Error> {
        self.0
            .iter()
            .map(|(path, set)| Ok((path.as_str(), Operator::parse_set(path, set)?)))
            .collect()
    }

    /// Compile into a conjunction of predicates against `model`.
    pub fn compile(&self, model: &Model) -> Result<Vec<Predicate>, Error> {
        let mut predicates = Vec::new();

        for (path, set) in &self.0 {
            let operand = model.path(path)?;
            for operator in Operator::parse_set(path, set)? {
                predicates.extend(operator.apply(&operand));
            }
        }

        Ok(predicates)
    }

    /// Compile against the select's model and attach the predicates to it.
    pub fn bind(&self, select: Select) -> Result<Select, Error> {
        let predicates = self.compile(&select.model)?;
        Ok(select.filter_all(predicates))
    }
}

impl From<BTreeMap<String, OperatorSet>> for Filters {
    fn from(value: BTreeMap<String, OperatorSet>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{Filterable, Operand, tests::Person},
        query::{Comparison, Literal},
    };
    use serde_json::json;

    #[test]
    fn test_parse_round_trips_wire_shape() {
        let wire = json!({"age": {"$gt": 5}, "name": {"$eq": "hello"}});
        let filters = Filters::parse(&wire.to_string()).unwrap();

        assert_eq!(filters.len(), 2);
        assert_eq!(serde_json::to_value(&filters).unwrap(), wire);
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        assert!(matches!(
            Filters::parse("{\"age\": 5}"),
            Err(Error::Deserialize(_))
        ));
        assert!(matches!(Filters::parse("{"), Err(Error::Deserialize(_))));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let filters = Filters::parse(
            r#"{"name": {"$like": "A%", "$ne": "Alec"}, "age": {"$gt": 18, "$lt": 35}, "data.inner.age": {"$in": [1, 2]}}"#,
        )
        .unwrap();

        let first = filters.compile(Person::model()).unwrap();
        let second = filters.compile(Person::model()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_compile_nested_equals() {
        let filters = Filters::new().with("data.age", "$eq", json!(30));
        let predicates = filters.compile(Person::model()).unwrap();

        assert_eq!(
            predicates,
            vec![Predicate::Compare {
                operand: Operand::Nested {
                    column: "data",
                    keys: vec!["age".to_string()],
                },
                comparison: Comparison::Equal,
                value: Literal::Int(30),
            }]
        );
    }

    #[test]
    fn test_compile_unknown_field() {
        let filters = Filters::new().with("email", "$eq", json!("a@b.c"));
        assert_eq!(
            filters.compile(Person::model()),
            Err(Error::UnknownField {
                path: "email".to_string()
            })
        );
    }

    #[test]
    fn test_compile_invalid_path_and_operator() {
        let filters = Filters::new().with("age.value", "$eq", json!(1));
        assert!(matches!(
            filters.compile(Person::model()),
            Err(Error::InvalidPath { .. })
        ));

        let filters = Filters::new().with("age", "$regex", json!(".*"));
        assert!(matches!(
            filters.compile(Person::model()),
            Err(Error::UnknownOperator { .. })
        ));
        assert!(filters.operators().is_err());
    }

    #[test]
    fn test_conflicting_operators_still_conjoin() {
        let filters = Filters::new()
            .with("age", "$eq", json!(1))
            .with("age", "$ne", json!(1));
        let predicates = filters.compile(Person::model()).unwrap();
        assert_eq!(predicates.len(), 2);
    }

    #[test]
    fn test_bind_appends_to_select() {
        let filters = Filters::new().with("age", "$has", json!(true));
        let select = filters.bind(Select::from_model::<Person>()).unwrap();
        assert_eq!(select.predicates.len(), 1);

        let select = filters.bind(select).unwrap();
        assert_eq!(select.predicates.len(), 2);
    }
}
