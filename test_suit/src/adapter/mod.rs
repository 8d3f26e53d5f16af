use filterables::{Filterable, Model, Select, Sorter, query::Direction};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub mod test_postgres;
pub mod test_sqlite;

/// Example: a person with a free-form profile document
#[derive(Filterable, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[filterable(table = "people")]
pub struct Person {
    pub id: i64,
    pub age: Option<i64>,
    pub name: String,
    pub active: bool,
    #[filterable(nested)]
    pub data: serde_json::Value,
}

pub const CITIES: [&str; 4] = ["Oslo", "Lima", "Pune", "Kyiv"];

/// 100 people in random insertion order.
///
/// Ages are `(id * 37) % 100`, a permutation of 0..100; every tenth person
/// has no age. `data.age` and `data.inner.inner.age` mirror `age`, and
/// `data.profile.city` cycles through `CITIES`.
pub fn people() -> Vec<Person> {
    let mut people: Vec<Person> = (0..100)
        .map(|id| {
            let age = (id * 37) % 100;
            Person {
                id,
                age: (id % 10 != 0).then_some(age),
                name: format!("Person-{:02}", id),
                active: id % 2 == 0,
                data: json!({
                    "age": age,
                    "profile": {"city": CITIES[id as usize % CITIES.len()]},
                    "inner": {"inner": {"age": age}},
                }),
            }
        })
        .collect();

    people.shuffle(&mut rand::rng());
    people
}

/// Sorts `<field>_<direction>` tokens, e.g. `age_desc`.
pub struct UnderscoreSorter;

impl Sorter for UnderscoreSorter {
    fn priority(&self) -> i32 {
        1
    }

    fn apply(&self, model: &Model, select: &Select, token: &str) -> Option<Select> {
        let (field, direction) = token.rsplit_once('_')?;
        let direction = Direction::parse(direction)?;
        let operand = model.path(field).ok().filter(|operand| !operand.is_nested())?;
        Some(select.clone().order_by(operand, direction))
    }
}

pub fn expected_ids(people: &[Person], keep: impl Fn(&Person) -> bool) -> Vec<i64> {
    let mut ids: Vec<i64> = people.iter().filter(|p| keep(p)).map(|p| p.id).collect();
    ids.sort();
    ids
}

#[test]
fn test_people_fixture() {
    let people = people();
    assert_eq!(people.len(), 100);
    assert_eq!(people.iter().filter(|p| p.age.is_none()).count(), 10);
    assert_eq!(Person::model().table, "people");
}
