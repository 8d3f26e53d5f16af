use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Storage kind of a declared field.
///
/// `Json` marks a semi-structured column holding a nested document; every
/// other kind is a direct scalar column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Integer,
    Real,
    Boolean,
    Text,
    Timestamp,
    Uuid,
    Json,
}

impl FieldKind {
    pub fn is_nested(&self) -> bool {
        matches!(self, FieldKind::Json)
    }

    pub fn is_direct(&self) -> bool {
        !self.is_nested()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Data model descriptor: where a model lives and which fields callers may address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Model {
    pub table: &'static str,
    pub primary_key: &'static str,
    pub fields: &'static [Field],
}

impl Model {
    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn primary_field(&self) -> Option<&'static Field> {
        self.field(self.primary_key)
    }

    /// Resolve a dot-separated path into an operand reference.
    ///
    /// The first segment must name a declared field. Direct fields take no
    /// further segments; JSON fields take any number of nested keys.
    pub fn path(&self, path: &str) -> Result<Operand, Error> {
        let mut segments = path.split('.');
        let root = segments.next().unwrap_or_default();

        let field = self.field(root).ok_or_else(|| Error::UnknownField {
            path: path.to_string(),
        })?;

        let keys: Vec<String> = segments.map(str::to_string).collect();
        if keys.iter().any(String::is_empty) {
            return Err(Error::InvalidPath {
                path: path.to_string(),
            });
        }

        if field.kind.is_direct() {
            if !keys.is_empty() {
                return Err(Error::InvalidPath {
                    path: path.to_string(),
                });
            }
            return Ok(Operand::Column {
                name: field.name,
                kind: field.kind,
            });
        }

        Ok(Operand::Nested {
            column: field.name,
            keys,
        })
    }
}

/// Implemented by every type that can be filtered, sorted and paginated.
///
/// Usually derived with `#[derive(Filterable)]`.
pub trait Filterable: Send + Sync + 'static {
    const MODEL: Model;

    fn model() -> &'static Model {
        &Self::MODEL
    }
}

/// Resolved target of a filter path or sort token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Column {
        name: &'static str,
        kind: FieldKind,
    },
    /// A value inside a JSON column; `keys` empty addresses the column itself.
    Nested {
        column: &'static str,
        keys: Vec<String>,
    },
}

impl Operand {
    pub fn column(&self) -> &'static str {
        match self {
            Operand::Column { name, .. } => name,
            Operand::Nested { column, .. } => column,
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Operand::Nested { .. })
    }

    /// Read the operand out of a materialized row.
    pub fn lookup<'a>(
        &self,
        record: &'a serde_json::Map<String, serde_json::Value>,
    ) -> Option<&'a serde_json::Value> {
        match self {
            Operand::Column { name, .. } => record.get(*name),
            Operand::Nested { column, keys } => keys
                .iter()
                .try_fold(record.get(*column)?, |value, key| value.get(key)),
        }
    }
}
