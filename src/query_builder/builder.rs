use super::bind::BindValue;
use super::conditions::{Condition, Criteria, Operator, WhereField};
use super::fields::{GroupByField, InnerQuery, SelectField, Selection, SortDirection, SortField};
use super::pagination::Pagination;
use crate::constants::PLACEHOLDER;
use crate::database::{DatabaseError, DatabaseResult};
use serde_json::{Map, Value};

/// How field names are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryKind {
    /// Field names are plain column references
    Relational,
    /// Field names are dotted paths into the JSONB `data` column
    #[default]
    Document,
}

#[derive(Debug, Clone, Default)]
enum InsertData {
    #[default]
    Empty,
    Row(Map<String, Value>),
    Rows(Vec<Map<String, Value>>),
}

/// Declarative query over a single table
#[derive(Debug, Clone)]
pub struct Query {
    kind: QueryKind,
    table: String,
    conditions: Vec<Condition>,
    select_fields: Vec<Selection>,
    sorts: Vec<SortField>,
    group_bys: Vec<GroupByField>,
    pagination: Pagination,
    insert_data: InsertData,
    update_data: Map<String, Value>,
    returning: Vec<String>,
    string_query: Option<String>,
}

const BEGIN_TRANSACTION: &str = "BEGIN";
const COMMIT_TRANSACTION: &str = "COMMIT";
const ROLLBACK_TRANSACTION: &str = "ROLLBACK";

impl Query {
    /// Create a new query for the given table and render mode
    pub fn new(table: &str, kind: QueryKind) -> Self {
        Self {
            kind,
            table: table.to_string(),
            conditions: Vec::new(),
            select_fields: Vec::new(),
            sorts: Vec::new(),
            group_bys: Vec::new(),
            pagination: Pagination::default(),
            insert_data: InsertData::Empty,
            update_data: Map::new(),
            returning: Vec::new(),
            string_query: None,
        }
    }

    pub fn document(table: &str) -> Self {
        Self::new(table, QueryKind::Document)
    }

    pub fn relational(table: &str) -> Self {
        Self::new(table, QueryKind::Relational)
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Add an equality condition
    pub fn add_condition(self, name: &str, criteria: impl Into<Criteria>) -> Self {
        self.add_condition_object(WhereField::eq(name, criteria))
    }

    /// Add a condition with an explicit operator
    pub fn add_condition_op(self, name: &str, operator: Operator, criteria: impl Into<Criteria>) -> Self {
        self.add_condition_object(WhereField::new(name, operator, criteria))
    }

    pub fn add_condition_object(mut self, condition: impl Into<Condition>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    /// Add `(A OR B OR ...)`
    pub fn add_condition_or(mut self, fields: Vec<WhereField>) -> Self {
        self.conditions
            .push(Condition::Or(fields.into_iter().map(Condition::Field).collect()));
        self
    }

    /// Select a field under its own name
    pub fn add_select_field(self, name: &str) -> Self {
        self.add_select_field_object(SelectField::new(name))
    }

    pub fn add_select_field_object(mut self, field: SelectField) -> Self {
        self.select_fields.push(Selection::Field(field));
        self
    }

    /// Select the result of a nested query as `alias`
    pub fn add_inner_select_query(mut self, query: Query, alias: &str) -> Self {
        self.select_fields.push(Selection::Inner(InnerQuery::new(query, alias)));
        self
    }

    pub fn add_sort(self, name: &str, direction: SortDirection) -> Self {
        self.add_sort_object(SortField::new(name, direction))
    }

    pub fn add_sort_object(mut self, sort: SortField) -> Self {
        self.sorts.push(sort);
        self
    }

    /// Replace the group-by list with primitive fields
    pub fn set_group_by(mut self, fields: &[&str]) -> Self {
        self.group_bys = fields.iter().map(|f| GroupByField::new(*f)).collect();
        self
    }

    pub fn add_group_by_object(mut self, field: GroupByField) -> Self {
        self.group_bys.push(field);
        self
    }

    pub fn set_limit(mut self, limit: u32) -> Self {
        self.pagination.set_limit(limit);
        self
    }

    pub fn set_offset(mut self, offset: u32) -> Self {
        self.pagination.set_offset(offset);
        self
    }

    pub fn set_insert_data(mut self, data: Map<String, Value>) -> Self {
        self.insert_data = InsertData::Row(data);
        self
    }

    pub fn set_bulk_insert_data(mut self, rows: Vec<Map<String, Value>>) -> Self {
        self.insert_data = InsertData::Rows(rows);
        self
    }

    pub fn set_update_data(mut self, data: Map<String, Value>) -> Self {
        self.update_data = data;
        self
    }

    /// Set one (possibly dotted) field of the update data
    pub fn add_update_data(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.update_data.insert(field.to_string(), value.into());
        self
    }

    /// Columns returned by insert statements
    pub fn returning(mut self, columns: &[&str]) -> Self {
        self.returning = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Override the rendered select statement with a raw one
    pub fn set_string_query(mut self, query: impl Into<String>) -> Self {
        self.string_query = Some(query.into());
        self
    }

    pub fn get_select_fields(&self) -> &[Selection] {
        &self.select_fields
    }

    pub fn get_update_data(&self) -> &Map<String, Value> {
        &self.update_data
    }

    pub(crate) fn without_selection(&self) -> Self {
        let mut query = self.clone();
        query.select_fields.clear();
        query.string_query = None;
        query
    }

    /// Bind parameters in placeholder order: select fields first, then conditions
    pub fn get_bind_params(&self) -> Vec<BindValue> {
        let mut params: Vec<BindValue> = self
            .select_fields
            .iter()
            .flat_map(Selection::bind_params)
            .collect();
        params.extend(self.get_condition_bind_params());
        params
    }

    /// Bind parameters of the WHERE clause alone, as used by update and delete
    pub fn get_condition_bind_params(&self) -> Vec<BindValue> {
        self.conditions
            .iter()
            .flat_map(|c| c.bind_params(self.kind))
            .collect()
    }

    fn where_sql(&self) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self.conditions.iter().map(|c| c.render(self.kind)).collect();
        format!(" WHERE {}", parts.join(" AND "))
    }

    /// Build the SELECT statement. With `bind_params` unset the `{?}` tokens are left
    /// in place, which is how inner queries are embedded.
    pub fn get_select_query(&self, bind_params: bool) -> String {
        if let Some(query) = &self.string_query {
            return query.clone();
        }

        let mut sql = String::from("SELECT ");

        if self.select_fields.is_empty() {
            sql.push_str(" * ");
        } else {
            let fields: Vec<String> = self.select_fields.iter().map(|f| f.render(self.kind)).collect();
            sql.push_str(&fields.join(","));
        }

        sql.push_str(" FROM ");
        sql.push_str(&self.table);
        sql.push_str(&self.where_sql());

        if !self.group_bys.is_empty() {
            let groups: Vec<String> = self.group_bys.iter().map(|g| g.render(self.kind)).collect();
            sql.push_str(&format!(" GROUP BY {}", groups.join(", ")));
        }

        if !self.sorts.is_empty() {
            let sorts: Vec<String> = self.sorts.iter().map(|s| s.render(self.kind)).collect();
            sql.push_str(&format!(" ORDER BY {}", sorts.join(",")));
        }

        sql.push_str(&self.pagination.to_sql());

        if bind_params {
            number_placeholders(&sql)
        } else {
            sql
        }
    }

    /// Build the UPDATE statement writing a precomputed document back.
    ///
    /// Only document queries support this; updates are read-modify-write (see
    /// [`crate::database::Dao::update`]).
    pub fn get_update_query(&self, document: &str) -> DatabaseResult<String> {
        match self.kind {
            QueryKind::Relational => Err(DatabaseError::not_implemented("get_update_query")),
            QueryKind::Document => Ok(format!(
                "UPDATE {} SET {}='{}' {}",
                self.table,
                crate::constants::JSONB_FIELD_NAME,
                escape_literal(document),
                // Numbered on its own so `{?}` inside the document stays literal
                number_placeholders(&self.where_sql())
            )),
        }
    }

    pub fn get_delete_query(&self) -> DatabaseResult<String> {
        match self.kind {
            QueryKind::Relational => Err(DatabaseError::not_implemented("get_delete_query")),
            QueryKind::Document => {
                let sql = format!("DELETE FROM {}{}", self.table, self.where_sql());
                Ok(number_placeholders(&sql))
            }
        }
    }

    /// Insert statement with literal values; relational inserts drop null values
    pub fn get_insert_query(&self) -> String {
        let row = match &self.insert_data {
            InsertData::Row(row) => row.clone(),
            InsertData::Rows(rows) => rows.first().cloned().unwrap_or_default(),
            InsertData::Empty => Map::new(),
        };

        let sql = match self.kind {
            QueryKind::Document => format!(
                "INSERT INTO {} VALUES ('{}')",
                self.table,
                escape_literal(&Value::Object(row).to_string())
            ),
            QueryKind::Relational => {
                let row: Vec<(String, String)> = row
                    .into_iter()
                    .filter_map(|(k, v)| literal_value(&v).map(|v| (k, v)))
                    .collect();
                let columns: Vec<String> = row.iter().map(|(k, _)| escape_literal(k)).collect();
                let values: Vec<String> = row.iter().map(|(_, v)| escape_literal(v)).collect();
                format!(
                    "INSERT INTO {}({}) VALUES ('{}')",
                    self.table,
                    columns.join(","),
                    values.join("','")
                )
            }
        };
        sql + &self.returning_sql()
    }

    /// Multi-row insert; empty when there are no rows
    pub fn get_bulk_insert_query(&self) -> String {
        let rows = match &self.insert_data {
            InsertData::Rows(rows) => rows.clone(),
            InsertData::Row(row) => vec![row.clone()],
            InsertData::Empty => Vec::new(),
        };
        if rows.is_empty() {
            return String::new();
        }

        let sql = match self.kind {
            QueryKind::Document => {
                let inserts: Vec<String> = rows
                    .into_iter()
                    .map(|row| format!(" ('{}')", escape_literal(&Value::Object(row).to_string())))
                    .collect();
                format!("INSERT INTO {} VALUES {}", self.table, inserts.join(", "))
            }
            QueryKind::Relational => {
                let columns: Vec<String> = rows[0]
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, _)| escape_literal(k))
                    .collect();
                let inserts: Vec<String> = rows
                    .iter()
                    .map(|row| {
                        let values: Vec<String> = row
                            .values()
                            .filter_map(literal_value)
                            .map(|v| escape_literal(&v))
                            .collect();
                        format!(" ('{}')", values.join("','"))
                    })
                    .collect();
                format!(
                    "INSERT INTO {}({}) VALUES {}",
                    self.table,
                    columns.join(","),
                    inserts.join(",")
                )
            }
        };
        sql + &self.returning_sql()
    }

    fn returning_sql(&self) -> String {
        if self.returning.is_empty() {
            String::new()
        } else {
            format!(" RETURNING {}", self.returning.join(", "))
        }
    }

    pub fn get_begin_transaction_query(&self) -> &'static str {
        BEGIN_TRANSACTION
    }

    pub fn get_commit_transaction_query(&self) -> &'static str {
        COMMIT_TRANSACTION
    }

    pub fn get_rollback_transaction_query(&self) -> &'static str {
        ROLLBACK_TRANSACTION
    }
}

/// Replace every `{?}` with `$1, $2, ...` in a single left-to-right pass
pub fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    let mut index = 1;

    while let Some(pos) = rest.find(PLACEHOLDER) {
        out.push_str(&rest[..pos]);
        out.push('$');
        out.push_str(&index.to_string());
        index += 1;
        rest = &rest[pos + PLACEHOLDER.len()..];
    }
    out.push_str(rest);
    out
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn literal_value(value: &Value) -> Option<String> {
    BindValue::from(value.clone()).literal_text()
}
