use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOp, FilterWhereOptions};

/// Renders the JSON where-DSL into a parameterized SQL fragment.
///
/// Parameter placeholders continue from `starting_param_index`, so fragments
/// can be composed into a larger statement without renumbering.
pub struct FilterWhere {
    base: usize,
    param_values: Vec<Value>,
}

impl FilterWhere {
    pub fn generate(
        where_data: &Value,
        starting_param_index: usize,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut this = Self { base: starting_param_index, param_values: vec![] };

        let mut parts = Vec::new();
        if !options.include_deleted {
            parts.push("\"is_delete\" = FALSE".to_string());
        }
        if !where_data.is_null() {
            let sql = this.render(where_data)?;
            if !sql.is_empty() {
                parts.push(sql);
            }
        }

        let clause = if parts.is_empty() { "1=1".to_string() } else { parts.join(" AND ") };
        Ok((clause, this.param_values))
    }

    pub fn generate_empty(options: &FilterWhereOptions) -> (String, Vec<Value>) {
        if options.include_deleted {
            ("1=1".to_string(), vec![])
        } else {
            ("\"is_delete\" = FALSE".to_string(), vec![])
        }
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn render(&mut self, data: &Value) -> Result<String, FilterError> {
        let obj = match data {
            Value::Object(obj) => obj,
            _ => {
                return Err(FilterError::InvalidWhereClause(
                    "WHERE conditions must be objects".to_string(),
                ))
            }
        };

        let mut parts = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                parts.push(self.render_logical(key, value)?);
            } else {
                parts.extend(self.render_field(key, value)?);
            }
        }

        Ok(match parts.len() {
            0 => String::new(),
            1 => parts.remove(0),
            _ => parts.join(" AND "),
        })
    }

    fn render_logical(&mut self, op: &str, value: &Value) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value.as_array().ok_or_else(|| {
                    FilterError::InvalidOperatorData(format!("{} requires an array", op))
                })?;
                let mut parts = Vec::new();
                for item in arr {
                    let sql = self.render(item)?;
                    if !sql.is_empty() {
                        parts.push(format!("({})", sql));
                    }
                }
                if parts.is_empty() {
                    return Ok("1=1".to_string());
                }
                if op == "$and" {
                    Ok(parts.join(" AND "))
                } else if parts.len() == 1 {
                    Ok(parts.remove(0))
                } else {
                    // Parenthesized so the group composes safely under AND
                    Ok(format!("({})", parts.join(" OR ")))
                }
            }
            "$not" => {
                let sql = self.render(value)?;
                if sql.is_empty() {
                    return Err(FilterError::InvalidOperatorData(
                        "$not requires at least one condition".to_string(),
                    ));
                }
                Ok(format!("NOT ({})", sql))
            }
            other => Err(FilterError::UnsupportedOperator(other.to_string())),
        }
    }

    fn render_field(&mut self, field: &str, value: &Value) -> Result<Vec<String>, FilterError> {
        Self::validate_column(field)?;

        if let Value::Object(ops) = value {
            let mut parts = Vec::new();
            for (op_key, op_val) in ops {
                let op = Self::map_operator(op_key)?;
                parts.push(self.op_sql(field, op, op_val)?);
            }
            Ok(parts)
        } else {
            // Implicit equality: { field: value }
            Ok(vec![self.op_sql(field, FilterOp::Eq, value)?])
        }
    }

    fn op_sql(&mut self, column: &str, op: FilterOp, data: &Value) -> Result<String, FilterError> {
        let quoted = format!("\"{}\"", column);
        Ok(match op {
            FilterOp::Eq => {
                if data.is_null() {
                    format!("{} IS NULL", quoted)
                } else {
                    format!("{} = {}", quoted, self.param(data.clone()))
                }
            }
            FilterOp::Ne => {
                if data.is_null() {
                    format!("{} IS NOT NULL", quoted)
                } else {
                    format!("{} <> {}", quoted, self.param(data.clone()))
                }
            }
            FilterOp::Gt => format!("{} > {}", quoted, self.param(data.clone())),
            FilterOp::Gte => format!("{} >= {}", quoted, self.param(data.clone())),
            FilterOp::Lt => format!("{} < {}", quoted, self.param(data.clone())),
            FilterOp::Lte => format!("{} <= {}", quoted, self.param(data.clone())),
            FilterOp::Like => format!("{} LIKE {}", quoted, self.param(data.clone())),
            FilterOp::ILike => format!("{} ILIKE {}", quoted, self.param(data.clone())),
            FilterOp::In => match data {
                Value::Array(values) if values.is_empty() => "1=0".to_string(),
                Value::Array(values) => {
                    let params: Vec<String> =
                        values.iter().map(|v| self.param(v.clone())).collect();
                    format!("{} IN ({})", quoted, params.join(", "))
                }
                other => format!("{} = {}", quoted, self.param(other.clone())),
            },
            FilterOp::NotIn => match data {
                Value::Array(values) if values.is_empty() => "1=1".to_string(),
                Value::Array(values) => {
                    let params: Vec<String> =
                        values.iter().map(|v| self.param(v.clone())).collect();
                    format!("{} NOT IN ({})", quoted, params.join(", "))
                }
                other => format!("{} <> {}", quoted, self.param(other.clone())),
            },
            FilterOp::Between => {
                let values = data.as_array().filter(|a| a.len() == 2).ok_or_else(|| {
                    FilterError::InvalidOperatorData(
                        "$between requires exactly 2 values".to_string(),
                    )
                })?;
                format!(
                    "{} BETWEEN {} AND {}",
                    quoted,
                    self.param(values[0].clone()),
                    self.param(values[1].clone())
                )
            }
        })
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        format!("${}", self.base + self.param_values.len())
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NotIn,
            "$between" => FilterOp::Between,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn validate_column(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidColumn(format!("Invalid column name: {}", name)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn generate(data: serde_json::Value) -> (String, Vec<Value>) {
        FilterWhere::generate(&data, 0, &FilterWhereOptions::default()).unwrap()
    }

    #[test]
    fn implicit_equality() {
        let (sql, params) = generate(json!({ "name": "admin" }));
        assert_eq!(sql, "\"is_delete\" = FALSE AND \"name\" = $1");
        assert_eq!(params, vec![json!("admin")]);
    }

    #[test]
    fn null_equality_uses_is_null() {
        let (sql, params) = generate(json!({ "remark": null }));
        assert_eq!(sql, "\"is_delete\" = FALSE AND \"remark\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn in_with_empty_list_matches_nothing() {
        let (sql, params) = generate(json!({ "id": { "$in": [] } }));
        assert_eq!(sql, "\"is_delete\" = FALSE AND 1=0");
        assert!(params.is_empty());
    }

    #[test]
    fn nested_or_keeps_param_numbering_contiguous() {
        // serde_json maps iterate in key order, so "$or" renders before "status"
        let (sql, params) = generate(json!({
            "status": 1,
            "$or": [
                { "code": "a" },
                { "code": "b" }
            ]
        }));
        assert_eq!(
            sql,
            "\"is_delete\" = FALSE AND ((\"code\" = $1) OR (\"code\" = $2)) AND \"status\" = $3"
        );
        assert_eq!(params, vec![json!("a"), json!("b"), json!(1)]);
    }

    #[test]
    fn starting_index_offsets_placeholders() {
        let (sql, params) =
            FilterWhere::generate(&json!({ "id": 5 }), 2, &FilterWhereOptions::default()).unwrap();
        assert_eq!(sql, "\"is_delete\" = FALSE AND \"id\" = $3");
        assert_eq!(params, vec![json!(5)]);
    }

    #[test]
    fn include_deleted_drops_soft_delete_guard() {
        let (sql, _) = FilterWhere::generate(
            &json!({ "id": 5 }),
            0,
            &FilterWhereOptions { include_deleted: true },
        )
        .unwrap();
        assert_eq!(sql, "\"id\" = $1");
    }

    #[test]
    fn between_requires_two_values() {
        let err = FilterWhere::generate(
            &json!({ "order_no": { "$between": [1] } }),
            0,
            &FilterWhereOptions::default(),
        );
        assert!(err.is_err());

        let (sql, params) = generate(json!({ "order_no": { "$between": [1, 10] } }));
        assert_eq!(sql, "\"is_delete\" = FALSE AND \"order_no\" BETWEEN $1 AND $2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = FilterWhere::generate(
            &json!({ "id": { "$regex": "x" } }),
            0,
            &FilterWhereOptions::default(),
        );
        assert!(matches!(err, Err(FilterError::UnsupportedOperator(_))));
    }

    #[test]
    fn hostile_column_names_are_rejected() {
        let err = FilterWhere::generate(
            &json!({ "id\"; DROP TABLE sys_user; --": 1 }),
            0,
            &FilterWhereOptions::default(),
        );
        assert!(matches!(err, Err(FilterError::InvalidColumn(_))));
    }

    #[test]
    fn not_wraps_conditions() {
        let (sql, params) = generate(json!({ "$not": { "status": 2 } }));
        assert_eq!(sql, "\"is_delete\" = FALSE AND NOT (\"status\" = $1)");
        assert_eq!(params, vec![json!(2)]);
    }
}
