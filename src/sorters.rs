use std::sync::Arc;

use tracing::debug;

use crate::{
    model::{Model, Operand},
    query::{Direction, Select},
};

/// A strategy turning one sort token into orderings on a select.
///
/// `apply` must never fail: tokens a strategy does not understand return
/// `None` so the next strategy can try.
pub trait Sorter: Send + Sync {
    /// Lower runs first. Built-in strategies use 900 and above.
    fn priority(&self) -> i32;

    fn apply(&self, model: &Model, select: &Select, token: &str) -> Option<Select>;
}

/// Split `field[:direction]`, defaulting to ascending.
fn split(token: &str) -> Option<(&str, Direction)> {
    let mut chunks = token.splitn(2, ':');
    let field = chunks.next().filter(|field| !field.is_empty())?;
    let direction = match chunks.next() {
        Some(direction) => Direction::parse(direction)?,
        None => Direction::Asc,
    };
    Some((field, direction))
}

/// `_pk[:direction]` sorts by the model's primary key.
pub struct PrimaryKeySorter;

impl PrimaryKeySorter {
    pub const FIELD: &'static str = "_pk";
}

impl Sorter for PrimaryKeySorter {
    fn priority(&self) -> i32 {
        900
    }

    fn apply(&self, model: &Model, select: &Select, token: &str) -> Option<Select> {
        let (field, direction) = split(token)?;
        if field != Self::FIELD {
            return None;
        }

        let primary = model.primary_field()?;
        let operand = Operand::Column {
            name: primary.name,
            kind: primary.kind,
        };
        Some(select.clone().order_by(operand, direction))
    }
}

/// `field[:asc|desc]` on a direct field of the model.
pub struct SimpleSorter;

impl Sorter for SimpleSorter {
    fn priority(&self) -> i32 {
        999
    }

    fn apply(&self, model: &Model, select: &Select, token: &str) -> Option<Select> {
        let (field, direction) = split(token)?;
        let field = model.field(field).filter(|field| field.kind.is_direct())?;

        let operand = Operand::Column {
            name: field.name,
            kind: field.kind,
        };
        Some(select.clone().order_by(operand, direction))
    }
}

/// Priority ordered sort strategies. Built once, read-only afterwards.
#[derive(Clone)]
pub struct Sorters {
    strategies: Vec<Arc<dyn Sorter>>,
}

impl Default for Sorters {
    fn default() -> Self {
        Self::empty().with(PrimaryKeySorter).with(SimpleSorter)
    }
}

impl Sorters {
    /// A registry with no strategies, not even the built-in ones.
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Register a strategy. Equal priorities keep registration order.
    pub fn with(mut self, sorter: impl Sorter + 'static) -> Self {
        self.strategies.push(Arc::new(sorter));
        self.strategies.sort_by_key(|sorter| sorter.priority());
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn priorities(&self) -> Vec<i32> {
        self.strategies.iter().map(|sorter| sorter.priority()).collect()
    }

    /// Apply the first matching strategy; an unmatched token leaves `select` as is.
    pub fn resolve(&self, model: &Model, select: Select, token: &str) -> Select {
        for sorter in &self.strategies {
            if let Some(sorted) = sorter.apply(model, &select, token) {
                return sorted;
            }
        }

        debug!(token, table = model.table, "dropping unmatched sort token");
        select
    }

    pub fn resolve_all<'a>(
        &self,
        model: &Model,
        select: Select,
        tokens: impl IntoIterator<Item = &'a str>,
    ) -> Select {
        tokens
            .into_iter()
            .fold(select, |select, token| self.resolve(model, select, token))
    }
}
