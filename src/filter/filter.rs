use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterCondition, FilterOp, FilterOrderInfo, FilterWhereInfo, SortDirection};
use crate::types::Record;

/// Table-scoped query description.
///
/// The same value drives both the REST query string sent to the store and
/// the in-memory evaluation used by the store double, so the two cannot drift.
#[derive(Debug, Clone)]
pub struct Filter {
    table_name: String,
    select_columns: Vec<String>,
    conditions: Vec<FilterCondition>,
    order_data: Vec<FilterOrderInfo>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            select_columns: vec![],
            conditions: vec![],
            order_data: vec![],
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    pub fn order_data(&self) -> &[FilterOrderInfo] {
        &self.order_data
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        for column in &columns {
            if column != "*" {
                Self::validate_column(column)?;
            }
        }
        self.select_columns = columns;
        Ok(self)
    }

    pub fn where_field(
        &mut self,
        column: &str,
        operator: FilterOp,
        data: Value,
    ) -> Result<&mut Self, FilterError> {
        let info = Self::where_info(column, operator, data)?;
        self.conditions.push(FilterCondition::Field(info));
        Ok(self)
    }

    pub fn eq(&mut self, column: &str, data: impl Into<Value>) -> Result<&mut Self, FilterError> {
        self.where_field(column, FilterOp::Eq, data.into())
    }

    pub fn gte(&mut self, column: &str, data: impl Into<Value>) -> Result<&mut Self, FilterError> {
        self.where_field(column, FilterOp::Gte, data.into())
    }

    pub fn lte(&mut self, column: &str, data: impl Into<Value>) -> Result<&mut Self, FilterError> {
        self.where_field(column, FilterOp::Lte, data.into())
    }

    pub fn is_in(&mut self, column: &str, values: Vec<Value>) -> Result<&mut Self, FilterError> {
        self.where_field(column, FilterOp::In, Value::Array(values))
    }

    /// Match rows where any of the given conditions holds
    pub fn any_of(
        &mut self,
        group: Vec<(&str, FilterOp, Value)>,
    ) -> Result<&mut Self, FilterError> {
        if group.is_empty() {
            return Err(FilterError::InvalidOperatorData("OR group requires at least one condition".to_string()));
        }
        let infos = group
            .into_iter()
            .map(|(column, operator, data)| Self::where_info(column, operator, data))
            .collect::<Result<Vec<_>, _>>()?;
        self.conditions.push(FilterCondition::Or(infos));
        Ok(self)
    }

    /// Case-insensitive substring match of `needle` against any of `columns`
    pub fn contains_any(&mut self, columns: &[&str], needle: &str) -> Result<&mut Self, FilterError> {
        let pattern = Value::String(like_contains(needle));
        self.any_of(
            columns
                .iter()
                .map(|column| (*column, FilterOp::ILike, pattern.clone()))
                .collect(),
        )
    }

    pub fn order(&mut self, column: &str, sort: SortDirection) -> Result<&mut Self, FilterError> {
        Self::validate_column(column)?;
        self.order_data.push(FilterOrderInfo { column: column.to_string(), sort });
        Ok(self)
    }

    /// Full query string for a select: `select`, one pair per condition, `order`
    pub fn to_query_pairs(&self) -> Result<Vec<(String, String)>, FilterError> {
        let mut pairs = vec![("select".to_string(), self.build_select_clause())];
        pairs.extend(FilterWhere::generate(&self.conditions)?);
        let order = FilterOrder::generate(&self.order_data);
        if !order.is_empty() {
            pairs.push(("order".to_string(), order));
        }
        Ok(pairs)
    }

    /// Condition pairs only, for update and delete
    pub fn to_where_pairs(&self) -> Result<Vec<(String, String)>, FilterError> {
        FilterWhere::generate(&self.conditions)
    }

    pub fn matches(&self, record: &Record) -> bool {
        FilterWhere::matches(&self.conditions, record)
    }

    /// Sort records in place using the filter's order clauses
    pub fn sort(&self, records: &mut [Record]) {
        if self.order_data.is_empty() {
            return;
        }
        records.sort_by(|a, b| FilterOrder::compare(a, b, &self.order_data));
    }

    /// Restrict a record to the selected columns
    pub fn project(&self, record: Record) -> Record {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            return record;
        }
        record
            .into_iter()
            .filter(|(k, _)| self.select_columns.contains(k))
            .collect()
    }

    fn where_info(column: &str, operator: FilterOp, data: Value) -> Result<FilterWhereInfo, FilterError> {
        Self::validate_column(column)?;
        match (&operator, &data) {
            (FilterOp::In, Value::Array(_)) => {}
            (FilterOp::In, _) => {
                return Err(FilterError::InvalidOperatorData(format!("in on '{}' requires an array", column)));
            }
            (_, Value::Array(_)) | (_, Value::Object(_)) => {
                return Err(FilterError::InvalidOperatorData(format!(
                    "{} on '{}' requires a scalar value",
                    operator.keyword(),
                    column
                )));
            }
            (FilterOp::ILike, v) if !v.is_string() => {
                return Err(FilterError::InvalidOperatorData(format!("ilike on '{}' requires a string pattern", column)));
            }
            _ => {}
        }
        Ok(FilterWhereInfo { column: column.to_string(), operator, data })
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        if !Self::is_identifier(name) {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)));
        }
        Ok(())
    }

    fn validate_column(column: &str) -> Result<(), FilterError> {
        if !Self::is_identifier(column) {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", column)));
        }
        Ok(())
    }

    fn is_identifier(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_alphabetic() || first == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_alphanumeric() || c == '_')
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            "*".to_string()
        } else {
            self.select_columns.join(",")
        }
    }
}

/// LIKE pattern matching `needle` anywhere, with its metacharacters escaped
pub fn like_contains(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
