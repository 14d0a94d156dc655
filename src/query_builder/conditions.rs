use super::bind::BindValue;
use super::builder::QueryKind;
use super::fields::{document_path, FieldType};
use super::functions::{apply_all, FieldFunction};
use crate::constants::PLACEHOLDER;
use serde_json::Value;

/// Comparison operators understood by the renderers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Is,
    IsNot,
    GreaterThan,
    LowerThan,
    GreaterThanEquals,
    LowerThanEquals,
    Like,
    /// `@>`
    Contains,
    /// `<@`
    ContainedBy,
    /// `?`
    Exists,
    /// `?|`
    ExistsAny,
    /// `?&`
    ExistsAll,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "<>",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
            Operator::GreaterThan => ">",
            Operator::LowerThan => "<",
            Operator::GreaterThanEquals => ">=",
            Operator::LowerThanEquals => "<=",
            Operator::Like => "LIKE",
            Operator::Contains => "@>",
            Operator::ContainedBy => "<@",
            Operator::Exists => "?",
            Operator::ExistsAny => "?|",
            Operator::ExistsAll => "?&",
        }
    }

    /// JSON containment and existence operators work on `jsonb`, never on text
    pub fn is_json_operator(&self) -> bool {
        matches!(
            self,
            Operator::Contains
                | Operator::ContainedBy
                | Operator::Exists
                | Operator::ExistsAny
                | Operator::ExistsAll
        )
    }

    /// Existence operators take a text array on the right-hand side
    pub fn is_existence(&self) -> bool {
        matches!(self, Operator::Exists | Operator::ExistsAny | Operator::ExistsAll)
    }
}

/// Right-hand side of a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    /// Rendered as the literal `NULL`; contributes no bind parameter
    Null,
    Scalar(BindValue),
    /// Null entries are dropped on construction
    List(Vec<BindValue>),
}

impl Criteria {
    pub fn value(value: impl Into<BindValue>) -> Self {
        match value.into() {
            BindValue::Null => Criteria::Null,
            other => Criteria::Scalar(other),
        }
    }

    pub fn list<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<BindValue>,
    {
        Criteria::List(
            values
                .into_iter()
                .map(Into::into)
                .filter(|v: &BindValue| !v.is_null())
                .collect(),
        )
    }

    fn values(&self) -> Vec<BindValue> {
        match self {
            Criteria::Null => Vec::new(),
            Criteria::Scalar(value) => vec![value.clone()],
            Criteria::List(values) => values.clone(),
        }
    }
}

impl From<BindValue> for Criteria {
    fn from(value: BindValue) -> Self {
        Criteria::value(value)
    }
}

impl From<&str> for Criteria {
    fn from(value: &str) -> Self {
        Criteria::value(value)
    }
}

impl From<String> for Criteria {
    fn from(value: String) -> Self {
        Criteria::value(value)
    }
}

impl From<&String> for Criteria {
    fn from(value: &String) -> Self {
        Criteria::value(value)
    }
}

impl From<i64> for Criteria {
    fn from(value: i64) -> Self {
        Criteria::value(value)
    }
}

impl From<bool> for Criteria {
    fn from(value: bool) -> Self {
        Criteria::value(value)
    }
}

impl<T: Into<BindValue>> From<Vec<T>> for Criteria {
    fn from(values: Vec<T>) -> Self {
        Criteria::list(values)
    }
}

/// JSON arrays become lists, JSON null becomes [`Criteria::Null`].
/// Use [`Criteria::value`] with [`BindValue::Json`] to compare against a whole array.
impl From<Value> for Criteria {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Criteria::list(items),
            other => Criteria::value(other),
        }
    }
}

/// A single `(field) operator value` predicate
#[derive(Debug, Clone, PartialEq)]
pub struct WhereField {
    pub name: String,
    pub operator: Operator,
    pub criteria: Criteria,
    pub field_type: FieldType,
    /// Wraps the value as `'[{"<criteria_field>": value }]'` for inverse containment
    pub criteria_field: Option<String>,
    pub functions: Vec<FieldFunction>,
    /// Functions applied to the placeholder before rendering
    pub value_functions: Vec<FieldFunction>,
}

impl WhereField {
    pub fn new(name: impl Into<String>, operator: Operator, criteria: impl Into<Criteria>) -> Self {
        Self {
            name: name.into(),
            operator,
            criteria: criteria.into(),
            field_type: FieldType::Primitive,
            criteria_field: None,
            functions: Vec::new(),
            value_functions: Vec::new(),
        }
    }

    pub fn eq(name: impl Into<String>, criteria: impl Into<Criteria>) -> Self {
        Self::new(name, Operator::Equals, criteria)
    }

    pub fn field_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn criteria_field(mut self, field: impl Into<String>) -> Self {
        self.criteria_field = Some(field.into());
        self
    }

    pub fn function(mut self, function: FieldFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub fn value_function(mut self, function: FieldFunction) -> Self {
        self.value_functions.push(function);
        self
    }

    fn uses_text_extraction(&self) -> bool {
        self.field_type.is_primitive() && !self.operator.is_json_operator()
    }

    fn field_expression(&self, kind: QueryKind) -> String {
        let expr = match kind {
            QueryKind::Relational => self.name.clone(),
            QueryKind::Document => document_path(&self.name, self.uses_text_extraction()),
        };
        apply_all(&self.functions, expr)
    }

    fn value_expression(&self, kind: QueryKind) -> String {
        let placeholder = apply_all(&self.value_functions, PLACEHOLDER.to_string());

        match kind {
            QueryKind::Relational => match &self.criteria {
                Criteria::Null => "NULL".to_string(),
                Criteria::Scalar(_) => placeholder,
                Criteria::List(values) => format!("({})", repeat(&placeholder, values.len())),
            },
            QueryKind::Document => {
                if let Some(field) = &self.criteria_field {
                    return format!("'[{{\"{field}\": {placeholder} }}]'");
                }
                match &self.criteria {
                    Criteria::Null => " NULL ".to_string(),
                    Criteria::Scalar(_) => format!(" {placeholder} "),
                    Criteria::List(values) if self.operator.is_existence() => {
                        format!("array[{}]", repeat(&placeholder, values.len()))
                    }
                    Criteria::List(values) => format!("({})", repeat(&placeholder, values.len())),
                }
            }
        }
    }

    pub fn render(&self, kind: QueryKind) -> String {
        format!(
            "({}) {} {}",
            self.field_expression(kind),
            self.operator.as_sql(),
            self.value_expression(kind)
        )
    }

    /// Values in placeholder order. Document predicates that compare against a bare
    /// `->>` extraction bind their values as text.
    ///
    /// A `criteria_field` wrapper renders one placeholder, so its criteria bind as one
    /// value: lists as a JSON array, null as SQL `NULL`.
    pub fn bind_params(&self, kind: QueryKind) -> Vec<BindValue> {
        if kind == QueryKind::Document && self.criteria_field.is_some() {
            let value = match &self.criteria {
                Criteria::Null => BindValue::Null,
                Criteria::Scalar(value) => value.clone(),
                Criteria::List(values) => {
                    BindValue::Json(Value::Array(values.iter().cloned().map(BindValue::into_json).collect()))
                }
            };
            return vec![value];
        }

        let values = self.criteria.values();
        let compares_text = kind == QueryKind::Document
            && self.name != crate::constants::JSONB_FIELD_NAME
            && self.uses_text_extraction()
            && self.functions.is_empty()
            && self.value_functions.is_empty();

        if compares_text || self.operator.is_existence() {
            values.into_iter().map(BindValue::into_text).collect()
        } else {
            values
        }
    }
}

fn repeat(placeholder: &str, count: usize) -> String {
    vec![placeholder; count].join(",")
}

/// A WHERE entry: a single predicate or an OR-group of entries
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Field(WhereField),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn render(&self, kind: QueryKind) -> String {
        match self {
            Condition::Field(field) => field.render(kind),
            Condition::Or(children) => {
                let parts: Vec<String> = children.iter().map(|c| c.render(kind)).collect();
                format!("({})", parts.join(" OR "))
            }
        }
    }

    pub fn bind_params(&self, kind: QueryKind) -> Vec<BindValue> {
        match self {
            Condition::Field(field) => field.bind_params(kind),
            Condition::Or(children) => children.iter().flat_map(|c| c.bind_params(kind)).collect(),
        }
    }
}

impl From<WhereField> for Condition {
    fn from(field: WhereField) -> Self {
        Condition::Field(field)
    }
}
