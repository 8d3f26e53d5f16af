use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    error::Error,
    model::Operand,
    query::{Comparison, Literal, Predicate},
};

pub const EQ: &str = "$eq";
pub const NE: &str = "$ne";
pub const IN: &str = "$in";
pub const NIN: &str = "$nin";
pub const GT: &str = "$gt";
pub const LT: &str = "$lt";
pub const HAS: &str = "$has";
pub const LIKE: &str = "$like";
pub const UNLIKE: &str = "$unlike";

/// Every operator symbol accepted on the wire.
pub const SYMBOLS: [&str; 9] = [EQ, NE, IN, NIN, GT, LT, HAS, LIKE, UNLIKE];

/// A wire operator symbol, checked against the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Eq,
    Ne,
    In,
    Nin,
    Gt,
    Lt,
    Has,
    Like,
    Unlike,
}

impl Symbol {
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol {
            EQ => Some(Symbol::Eq),
            NE => Some(Symbol::Ne),
            IN => Some(Symbol::In),
            NIN => Some(Symbol::Nin),
            GT => Some(Symbol::Gt),
            LT => Some(Symbol::Lt),
            HAS => Some(Symbol::Has),
            LIKE => Some(Symbol::Like),
            UNLIKE => Some(Symbol::Unlike),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::Eq => EQ,
            Symbol::Ne => NE,
            Symbol::In => IN,
            Symbol::Nin => NIN,
            Symbol::Gt => GT,
            Symbol::Lt => LT,
            Symbol::Has => HAS,
            Symbol::Like => LIKE,
            Symbol::Unlike => UNLIKE,
        }
    }
}

/// Operator symbol → raw wire value, for a single path.
pub type OperatorSet = BTreeMap<String, Value>;

/// The closed filter vocabulary, each variant carrying the values it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Equals(Literal),
    NotEquals(Literal),
    In(Vec<Literal>),
    NotIn(Vec<Literal>),
    GreaterThan(Literal),
    LessThan(Literal),
    /// `$gt` and `$lt` on the same path. Inverted bounds match nothing.
    Between { lower: Literal, upper: Literal },
    Has(bool),
    Like(String),
    Unlike(String),
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Equals(_) => "Equals",
            Operator::NotEquals(_) => "NotEquals",
            Operator::In(_) => "In",
            Operator::NotIn(_) => "NotIn",
            Operator::GreaterThan(_) => "GreaterThan",
            Operator::LessThan(_) => "LessThan",
            Operator::Between { .. } => "Between",
            Operator::Has(_) => "Has",
            Operator::Like(_) => "Like",
            Operator::Unlike(_) => "Unlike",
        }
    }

    /// Parse the operator set of one path into typed operators.
    ///
    /// `$gt` together with `$lt` becomes a single `Between`; every other
    /// symbol stands alone.
    pub fn parse_set(path: &str, set: &OperatorSet) -> Result<Vec<Operator>, Error> {
        if set.is_empty() {
            return Err(Error::mismatch(path, "{}", "no operators given"));
        }

        let entries = set
            .iter()
            .map(|(symbol, value)| match Symbol::parse(symbol) {
                Some(parsed) => Ok((parsed, value)),
                None => Err(Error::UnknownOperator {
                    path: path.to_string(),
                    operator: symbol.clone(),
                }),
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let upper = entries
            .iter()
            .find(|(symbol, _)| *symbol == Symbol::Lt)
            .map(|(_, value)| *value);
        let between = upper.filter(|_| entries.iter().any(|(symbol, _)| *symbol == Symbol::Gt));
        let mut operators = Vec::with_capacity(entries.len());

        for (symbol, value) in entries {
            let name = symbol.as_str();
            let operator = match (symbol, between) {
                (Symbol::Eq, _) => Operator::Equals(scalar(path, name, value)?),
                (Symbol::Ne, _) => Operator::NotEquals(scalar(path, name, value)?),
                (Symbol::In, _) => Operator::In(scalars(path, name, value)?),
                (Symbol::Nin, _) => Operator::NotIn(scalars(path, name, value)?),
                (Symbol::Gt, Some(upper)) => Operator::Between {
                    lower: orderable(path, name, value)?,
                    upper: orderable(path, LT, upper)?,
                },
                (Symbol::Lt, Some(_)) => continue,
                (Symbol::Gt, None) => Operator::GreaterThan(orderable(path, name, value)?),
                (Symbol::Lt, None) => Operator::LessThan(orderable(path, name, value)?),
                (Symbol::Has, _) => match value {
                    Value::Bool(present) => Operator::Has(*present),
                    _ => return Err(Error::mismatch(path, name, "expected a boolean")),
                },
                (Symbol::Like, _) => Operator::Like(pattern(path, name, value)?),
                (Symbol::Unlike, _) => Operator::Unlike(pattern(path, name, value)?),
            };
            operators.push(operator);
        }

        Ok(operators)
    }

    /// Build the predicate fragments for this operator against an operand.
    pub fn apply(&self, operand: &Operand) -> Vec<Predicate> {
        let compare = |comparison, value: &Literal| Predicate::Compare {
            operand: operand.clone(),
            comparison,
            value: value.clone(),
        };

        match self {
            Operator::Equals(value) => vec![compare(Comparison::Equal, value)],
            Operator::NotEquals(value) => vec![compare(Comparison::NotEqual, value)],
            Operator::In(values) => vec![Predicate::Membership {
                operand: operand.clone(),
                values: values.clone(),
                negated: false,
            }],
            Operator::NotIn(values) => vec![Predicate::Membership {
                operand: operand.clone(),
                values: values.clone(),
                negated: true,
            }],
            Operator::GreaterThan(value) => vec![compare(Comparison::GreaterThan, value)],
            Operator::LessThan(value) => vec![compare(Comparison::LessThan, value)],
            Operator::Between { lower, upper } => vec![
                compare(Comparison::GreaterThan, lower),
                compare(Comparison::LessThan, upper),
            ],
            Operator::Has(present) => vec![Predicate::Presence {
                operand: operand.clone(),
                negated: !present,
            }],
            Operator::Like(pattern) => vec![Predicate::Pattern {
                operand: operand.clone(),
                pattern: pattern.clone(),
                negated: false,
            }],
            Operator::Unlike(pattern) => vec![Predicate::Pattern {
                operand: operand.clone(),
                pattern: pattern.clone(),
                negated: true,
            }],
        }
    }
}

fn scalar(path: &str, symbol: &str, value: &Value) -> Result<Literal, Error> {
    Literal::from_json(value).ok_or_else(|| Error::mismatch(path, symbol, "expected a single value"))
}

fn scalars(path: &str, symbol: &str, value: &Value) -> Result<Vec<Literal>, Error> {
    let Value::Array(items) = value else {
        return Err(Error::mismatch(path, symbol, "expected an array of values"));
    };
    if items.is_empty() {
        return Err(Error::mismatch(path, symbol, "expected at least one value"));
    }
    items.iter().map(|item| scalar(path, symbol, item)).collect()
}

fn orderable(path: &str, symbol: &str, value: &Value) -> Result<Literal, Error> {
    match Literal::from_json(value) {
        Some(literal) if literal.is_numeric() || literal.as_text().is_some() => Ok(literal),
        _ => Err(Error::mismatch(path, symbol, "expected a number or a string")),
    }
}

fn pattern(path: &str, symbol: &str, value: &Value) -> Result<String, Error> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::mismatch(path, symbol, "expected a string pattern"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldKind;
    use serde_json::json;

    fn set(value: Value) -> OperatorSet {
        serde_json::from_value(value).unwrap()
    }

    fn age() -> Operand {
        Operand::Column {
            name: "age",
            kind: FieldKind::Integer,
        }
    }

    #[test]
    fn test_between_from_gt_and_lt() {
        let operators = Operator::parse_set("age", &set(json!({"$gt": 18, "$lt": 35}))).unwrap();
        assert_eq!(
            operators,
            vec![Operator::Between {
                lower: Literal::Int(18),
                upper: Literal::Int(35),
            }]
        );
    }

    #[test]
    fn test_lone_bounds_stay_alone() {
        let operators = Operator::parse_set("age", &set(json!({"$gt": 18}))).unwrap();
        assert_eq!(operators, vec![Operator::GreaterThan(Literal::Int(18))]);

        let operators = Operator::parse_set("age", &set(json!({"$lt": 2.5}))).unwrap();
        assert_eq!(operators, vec![Operator::LessThan(Literal::Float(2.5))]);
    }

    #[test]
    fn test_multiple_operators_on_one_path() {
        let operators =
            Operator::parse_set("name", &set(json!({"$ne": "Bob", "$like": "B%"}))).unwrap();
        assert_eq!(
            operators,
            vec![
                Operator::Like("B%".to_string()),
                Operator::NotEquals(Literal::Text("Bob".to_string())),
            ]
        );
    }

    #[test]
    fn test_symbol_vocabulary() {
        for symbol in SYMBOLS {
            assert_eq!(Symbol::parse(symbol).map(|parsed| parsed.as_str()), Some(symbol));
        }
        assert_eq!(Symbol::parse("$gte"), None);
        assert_eq!(Symbol::parse("eq"), None);
    }

    #[test]
    fn test_unknown_operator() {
        let err = Operator::parse_set("age", &set(json!({"$gte": 18}))).unwrap_err();
        assert_eq!(
            err,
            Error::UnknownOperator {
                path: "age".to_string(),
                operator: "$gte".to_string(),
            }
        );
    }

    #[test]
    fn test_operand_mismatch() {
        let cases = [
            json!({}),
            json!({"$in": 18}),
            json!({"$in": []}),
            json!({"$nin": [[1]]}),
            json!({"$eq": [1, 2]}),
            json!({"$gt": true}),
            json!({"$gt": 1, "$lt": null}),
            json!({"$has": "yes"}),
            json!({"$like": 19}),
            json!({"$unlike": null}),
        ];

        for case in cases {
            let result = Operator::parse_set("age", &set(case.clone()));
            assert!(
                matches!(result, Err(Error::OperandMismatch { .. })),
                "expected mismatch for {case}"
            );
        }
    }

    #[test]
    fn test_between_applies_as_conjunction() {
        let predicates = Operator::Between {
            lower: Literal::Int(40),
            upper: Literal::Int(20),
        }
        .apply(&age());

        assert_eq!(
            predicates,
            vec![
                Predicate::Compare {
                    operand: age(),
                    comparison: Comparison::GreaterThan,
                    value: Literal::Int(40),
                },
                Predicate::Compare {
                    operand: age(),
                    comparison: Comparison::LessThan,
                    value: Literal::Int(20),
                },
            ]
        );
    }

    #[test]
    fn test_negated_variants() {
        assert_eq!(
            Operator::NotIn(vec![Literal::Int(1)]).apply(&age()),
            vec![Predicate::Membership {
                operand: age(),
                values: vec![Literal::Int(1)],
                negated: true,
            }]
        );
        assert_eq!(
            Operator::Has(false).apply(&age()),
            vec![Predicate::Presence {
                operand: age(),
                negated: true,
            }]
        );
        assert_eq!(
            Operator::Unlike("%x".into()).apply(&age()),
            vec![Predicate::Pattern {
                operand: age(),
                pattern: "%x".to_string(),
                negated: true,
            }]
        );
    }
}
