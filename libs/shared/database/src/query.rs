use std::fmt::Display;

/// Builder for PostgREST resource paths.
///
/// Filter values are percent-encoded; the `select` clause is kept verbatim so
/// embedded resources (`profile:profiles!inner(nombre_completo)`) reach
/// PostgREST untouched.
#[derive(Debug, Clone)]
pub struct PostgrestQuery {
    table: String,
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl PostgrestQuery {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            select: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    fn filter(mut self, column: &str, operator: &str, value: String) -> Self {
        self.filters.push((column.to_string(), format!("{}.{}", operator, value)));
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        let value = encode(value);
        self.filter(column, "eq", value)
    }

    pub fn neq(self, column: &str, value: impl Display) -> Self {
        let value = encode(value);
        self.filter(column, "neq", value)
    }

    pub fn gte(self, column: &str, value: impl Display) -> Self {
        let value = encode(value);
        self.filter(column, "gte", value)
    }

    pub fn lte(self, column: &str, value: impl Display) -> Self {
        let value = encode(value);
        self.filter(column, "lte", value)
    }

    /// Case-insensitive substring match.
    pub fn ilike(self, column: &str, fragment: &str) -> Self {
        let value = format!("*{}*", urlencoding::encode(fragment));
        self.filter(column, "ilike", value)
    }

    pub fn in_list<V: Display>(self, column: &str, values: &[V]) -> Self {
        let list = encode_list(values);
        self.filter(column, "in", list)
    }

    pub fn not_in<V: Display>(self, column: &str, values: &[V]) -> Self {
        let list = encode_list(values);
        self.filter(column, "not.in", list)
    }

    pub fn is_null(self, column: &str) -> Self {
        self.filter(column, "is", "null".to_string())
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{}.{}", column, direction));
        self
    }

    pub fn order_nulls_last(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{}.{}.nullslast", column, direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Path for a row-level write (`PATCH`/`DELETE`): filters only.
    pub fn to_filter_path(&self) -> String {
        let params: Vec<String> = self
            .filters
            .iter()
            .map(|(column, expr)| format!("{}={}", column, expr))
            .collect();
        join_path(&self.table, params)
    }

    pub fn to_path(&self) -> String {
        let mut params = Vec::new();

        if let Some(select) = &self.select {
            params.push(format!("select={}", select));
        }
        for (column, expr) in &self.filters {
            params.push(format!("{}={}", column, expr));
        }
        if !self.order.is_empty() {
            params.push(format!("order={}", self.order.join(",")));
        }
        if let Some(limit) = self.limit {
            params.push(format!("limit={}", limit));
        }
        if let Some(offset) = self.offset {
            params.push(format!("offset={}", offset));
        }

        join_path(&self.table, params)
    }
}

fn encode(value: impl Display) -> String {
    urlencoding::encode(&value.to_string()).into_owned()
}

fn encode_list<V: Display>(values: &[V]) -> String {
    let items: Vec<String> = values.iter().map(|v| encode(v)).collect();
    format!("({})", items.join(","))
}

fn join_path(table: &str, params: Vec<String>) -> String {
    if params.is_empty() {
        format!("/rest/v1/{}", table)
    } else {
        format!("/rest/v1/{}?{}", table, params.join("&"))
    }
}
