//! Select, inner-query, sort and group-by fields.

use super::bind::BindValue;
use super::builder::{Query, QueryKind};
use super::functions::{apply_all, FieldFunction};
use crate::constants::JSONB_FIELD_NAME;
use serde::{Deserialize, Serialize};

/// Declared shape of a field's value inside a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Primitive,
    Object,
    Array,
}

impl FieldType {
    pub fn is_primitive(self) -> bool {
        self == FieldType::Primitive
    }
}

/// Translate a dotted name into a JSONB path against the document column.
///
/// `a.b.c` becomes `data->'a'->'b'->>'c'` when `text_last` is set, otherwise every
/// segment uses `->`. The bare column name is returned unchanged.
pub fn document_path(name: &str, text_last: bool) -> String {
    if name == JSONB_FIELD_NAME {
        return name.to_string();
    }

    let segments: Vec<String> = name.split('.').map(|part| format!("'{part}'")).collect();
    let last = segments.len() - 1;
    let mut path = String::from(JSONB_FIELD_NAME);
    for (i, segment) in segments.iter().enumerate() {
        path.push_str(if i == last && text_last { "->>" } else { "->" });
        path.push_str(segment);
    }
    path
}

/// A single selected field
#[derive(Debug, Clone, PartialEq)]
pub struct SelectField {
    pub name: String,
    pub alias: String,
    pub field_type: FieldType,
    pub functions: Vec<FieldFunction>,
}

impl SelectField {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
            field_type: FieldType::Primitive,
            functions: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        if !alias.is_empty() {
            self.alias = alias;
        }
        self
    }

    pub fn field_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn function(mut self, function: FieldFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub fn render(&self, kind: QueryKind) -> String {
        let expr = match kind {
            QueryKind::Relational => self.name.clone(),
            QueryKind::Document => document_path(&self.name, self.field_type.is_primitive()),
        };
        format!("{} AS {}", apply_all(&self.functions, expr), self.alias)
    }
}

/// A nested select rendered as `(SELECT ...) as alias`
#[derive(Debug, Clone)]
pub struct InnerQuery {
    pub query: Query,
    pub alias: String,
}

impl InnerQuery {
    pub fn new(query: Query, alias: impl Into<String>) -> Self {
        Self {
            query,
            alias: alias.into(),
        }
    }

    /// Placeholders stay unnumbered so the outer query numbers them in one pass
    pub fn render(&self) -> String {
        format!("({}) as {}", self.query.get_select_query(false), self.alias)
    }
}

/// Anything that can appear in a select list
#[derive(Debug, Clone)]
pub enum Selection {
    Field(SelectField),
    Inner(InnerQuery),
}

impl Selection {
    pub fn render(&self, kind: QueryKind) -> String {
        match self {
            Selection::Field(field) => field.render(kind),
            Selection::Inner(inner) => inner.render(),
        }
    }

    pub fn alias(&self) -> &str {
        match self {
            Selection::Field(field) => &field.alias,
            Selection::Inner(inner) => &inner.alias,
        }
    }

    pub fn bind_params(&self) -> Vec<BindValue> {
        match self {
            Selection::Field(_) => Vec::new(),
            Selection::Inner(inner) => inner.query.get_bind_params(),
        }
    }

    /// Object and array fields come back as JSON text and are decoded;
    /// primitive fields and inner-query results pass through as raw scalars.
    pub fn decodes_json(&self) -> bool {
        match self {
            Selection::Field(field) => !field.field_type.is_primitive(),
            Selection::Inner(_) => false,
        }
    }
}

impl From<SelectField> for Selection {
    fn from(field: SelectField) -> Self {
        Selection::Field(field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub name: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn new(name: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            name: name.into(),
            direction,
        }
    }

    /// Document sorts always compare the text form of the last segment
    pub fn render(&self, kind: QueryKind) -> String {
        let expr = match kind {
            QueryKind::Relational => self.name.clone(),
            QueryKind::Document => document_path(&self.name, true),
        };
        format!("{} {}", expr, self.direction.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupByField {
    pub name: String,
    pub field_type: FieldType,
    pub functions: Vec<FieldFunction>,
}

impl GroupByField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Primitive,
            functions: Vec::new(),
        }
    }

    pub fn field_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn function(mut self, function: FieldFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub fn render(&self, kind: QueryKind) -> String {
        let expr = match kind {
            QueryKind::Relational => self.name.clone(),
            QueryKind::Document => document_path(&self.name, self.field_type.is_primitive()),
        };
        apply_all(&self.functions, expr)
    }
}
