/// Represents pagination parameters for SQL queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Pagination {
    /// Create pagination with page number and per-page count
    pub fn page(page: u32, per_page: u32) -> Self {
        let offset = if page > 1 { Some((page - 1) * per_page) } else { None };
        Self {
            limit: Some(per_page),
            offset,
        }
    }

    /// Zero clears the limit
    pub fn set_limit(&mut self, limit: u32) {
        self.limit = (limit > 0).then_some(limit);
    }

    /// Zero clears the offset
    pub fn set_offset(&mut self, offset: u32) {
        self.offset = (offset > 0).then_some(offset);
    }

    /// Convert to SQL string
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        sql
    }
}
