//! SQL statement construction for the SQLite driver.
//!
//! Identifiers are validated and interpolated; values are always returned as
//! bound parameters alongside the statement text.

use crate::driver::criteria::{Criteria, FindOptions, Operator};
use crate::error::{Error, Result};
use crate::model::{validate_identifier, Document, TableMetadata};
use crate::schema::{Column, ColumnType};
use crate::value::Value;

/// Statement text and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    fn new(sql: String, params: Vec<Value>) -> Self {
        Statement { sql, params }
    }
}

pub fn type_name(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Integer | ColumnType::Bit | ColumnType::Date => "INTEGER",
        ColumnType::Float => "REAL",
        ColumnType::String => "TEXT",
        ColumnType::Blob => "BLOB",
    }
}

fn column_sql(name: &str, column: &Column) -> String {
    let mut sql = format!("{} {}", name, type_name(column.column_type));
    if column.autoincrement && column.primary_key {
        sql.push_str(" PRIMARY KEY AUTOINCREMENT");
    }
    if column.nullable {
        sql.push_str(" NULL");
    } else {
        sql.push_str(" NOT NULL");
    }
    sql
}

pub fn create_table(table: &TableMetadata) -> Result<String> {
    validate_identifier(&table.name)?;

    let mut definitions = Vec::with_capacity(table.columns.len() + 1);
    for (name, column) in &table.columns {
        validate_identifier(name)?;
        definitions.push(column_sql(name, column));
    }

    if table.has_composite_key() && table.columns.iter().any(|(_, c)| c.autoincrement) {
        return Err(Error::schema(format!(
            "Error creating table `{}`: `autoincrement` is not supported on models using composite primary keys",
            table.name
        )));
    }

    let mut options = "";
    if table.autoincrement_key().is_none() {
        definitions.push(format!("PRIMARY KEY ({})", table.primary_key.join(", ")));
        if table.has_composite_key() {
            options = " WITHOUT ROWID";
        }
    }

    Ok(format!(
        "CREATE TABLE {} (\n  {}\n){}",
        table.name,
        definitions.join(",\n  "),
        options
    ))
}

/// Turn a document into the `(column, value)` pairs to insert.
///
/// Autoincrement columns are skipped. Generators run and their output is
/// written back into `document`. Every violation is collected before failing.
pub fn insert_row(table: &TableMetadata, document: &mut Document) -> Result<Vec<(String, Value)>> {
    let mut row = Vec::with_capacity(table.columns.len());
    let mut errors = Vec::new();

    for (name, column) in &table.columns {
        if column.autoincrement {
            continue;
        }

        let value = match &column.generator {
            Some(generator) => {
                let value = generator();
                document.set(name.as_str(), value.clone());
                value
            }
            None => document.value(name),
        };

        if check_value(name, column, &value, &mut errors) {
            row.push((name.clone(), value));
        }
    }

    finish_row(table, row, errors)
}

/// Non-key columns of an existing document, validated like an insert.
///
/// Generators do not run on update. A table made only of key columns sets
/// its key columns to their current values.
pub fn update_row(table: &TableMetadata, document: &Document) -> Result<Vec<(String, Value)>> {
    let mut row = Vec::with_capacity(table.columns.len());
    let mut errors = Vec::new();

    let only_keys = table.columns.iter().all(|(_, c)| c.primary_key);
    for (name, column) in &table.columns {
        if column.autoincrement || (column.primary_key && !only_keys) {
            continue;
        }
        let value = document.value(name);
        if check_value(name, column, &value, &mut errors) {
            row.push((name.clone(), value));
        }
    }

    finish_row(table, row, errors)
}

fn check_value(name: &str, column: &Column, value: &Value, errors: &mut Vec<String>) -> bool {
    if value.is_null() && !column.nullable {
        errors.push(format!(
            "`{}`: value is null but the column is marked as not nullable",
            name
        ));
        return false;
    }
    if !value.fits(column.column_type) {
        errors.push(format!(
            "`{}`: expected a value of type `{}`, got `{}`",
            name,
            column.column_type,
            value.kind()
        ));
        return false;
    }
    true
}

fn finish_row(
    table: &TableMetadata,
    row: Vec<(String, Value)>,
    errors: Vec<String>,
) -> Result<Vec<(String, Value)>> {
    if errors.is_empty() {
        Ok(row)
    } else {
        Err(Error::DataValidation {
            collection: table.name.clone(),
            errors,
        })
    }
}

pub fn insert(table: &TableMetadata, row: Vec<(String, Value)>) -> Statement {
    if row.is_empty() {
        return Statement::new(format!("INSERT INTO {} DEFAULT VALUES", table.name), Vec::new());
    }

    let (names, params): (Vec<String>, Vec<Value>) = row.into_iter().unzip();
    let placeholders = vec!["?"; names.len()].join(", ");
    Statement::new(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name,
            names.join(", "),
            placeholders
        ),
        params,
    )
}

pub fn update(
    table: &TableMetadata,
    row: Vec<(String, Value)>,
    key: Vec<(String, Value)>,
) -> Result<Statement> {
    let (names, mut params): (Vec<String>, Vec<Value>) = row.into_iter().unzip();
    let assignments: Vec<String> = names.iter().map(|n| format!("{} = ?", n)).collect();
    let where_sql = key_criteria(table, key, &mut params)?;
    Ok(Statement::new(
        format!(
            "UPDATE {} SET {} WHERE {}",
            table.name,
            assignments.join(", "),
            where_sql
        ),
        params,
    ))
}

pub fn delete(table: &TableMetadata, key: Vec<(String, Value)>) -> Result<Statement> {
    let mut params = Vec::new();
    let where_sql = key_criteria(table, key, &mut params)?;
    Ok(Statement::new(
        format!("DELETE FROM {} WHERE {}", table.name, where_sql),
        params,
    ))
}

pub fn select_by_key(table: &TableMetadata, key: Vec<(String, Value)>) -> Result<Statement> {
    let mut params = Vec::new();
    let where_sql = key_criteria(table, key, &mut params)?;
    Ok(Statement::new(
        format!(
            "SELECT {} FROM {} WHERE {}",
            select_list(table),
            table.name,
            where_sql
        ),
        params,
    ))
}

pub fn select(table: &TableMetadata, options: &FindOptions) -> Result<Statement> {
    let mut params = Vec::new();
    let mut sql = format!("SELECT {} FROM {}", select_list(table), table.name);

    if let Some(where_sql) = format_criteria(table, &options.criteria, &mut params)? {
        sql.push_str(" WHERE ");
        sql.push_str(&where_sql);
    }

    if !options.sort.is_empty() {
        let mut order = Vec::with_capacity(options.sort.len());
        for (field, direction) in &options.sort {
            check_field(table, field)?;
            order.push(format!("{} {}", field, direction.sql()));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));
    }

    match (options.limit, options.offset) {
        (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
        (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
        (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
        (None, None) => {}
    }

    Ok(Statement::new(sql, params))
}

pub fn count(table: &TableMetadata, criteria: &Criteria) -> Result<Statement> {
    let mut params = Vec::new();
    let mut sql = format!("SELECT COUNT(*) FROM {}", table.name);
    if let Some(where_sql) = format_criteria(table, criteria, &mut params)? {
        sql.push_str(" WHERE ");
        sql.push_str(&where_sql);
    }
    Ok(Statement::new(sql, params))
}

fn select_list(table: &TableMetadata) -> String {
    table.column_names().collect::<Vec<_>>().join(", ")
}

fn check_field(table: &TableMetadata, field: &str) -> Result<()> {
    validate_identifier(field)?;
    if table.column(field).is_none() {
        return Err(Error::invalid_argument(format!(
            "table `{}` has no column `{}`",
            table.name, field
        )));
    }
    Ok(())
}

fn key_criteria(
    table: &TableMetadata,
    key: Vec<(String, Value)>,
    params: &mut Vec<Value>,
) -> Result<String> {
    if key.is_empty() {
        return Err(Error::invalid_argument("`criteria` cannot be empty"));
    }
    let criteria = Criteria::from(key);
    format_criteria(table, &criteria, params)?
        .ok_or_else(|| Error::invalid_argument("`criteria` cannot be empty"))
}

/// Render `criteria` as a `WHERE` body, appending its parameters.
///
/// Returns `None` for empty criteria. Several conditions are joined with
/// `AND` and parenthesised.
pub fn format_criteria(
    table: &TableMetadata,
    criteria: &Criteria,
    params: &mut Vec<Value>,
) -> Result<Option<String>> {
    if criteria.is_empty() {
        return Ok(None);
    }

    let mut parts = Vec::with_capacity(criteria.conditions().len());
    for condition in criteria.conditions() {
        check_field(table, &condition.field)?;
        let field = condition.field.as_str();

        let part = match condition.op {
            Operator::In => {
                if condition.values.is_empty() {
                    "0 = 1".to_string()
                } else {
                    params.extend(condition.values.iter().cloned());
                    let placeholders = vec!["?"; condition.values.len()].join(", ");
                    format!("{} IN ({})", field, placeholders)
                }
            }
            op => {
                let value = match condition.values.as_slice() {
                    [value] => value,
                    _ => {
                        return Err(Error::invalid_argument(format!(
                            "operator `{}` on `{}` takes exactly one value",
                            op.sql(),
                            field
                        )))
                    }
                };
                match (op, value.is_null()) {
                    (Operator::Eq, true) => format!("{} IS NULL", field),
                    (Operator::Ne, true) => format!("{} IS NOT NULL", field),
                    (_, true) => {
                        return Err(Error::invalid_argument(format!(
                            "operator `{}` on `{}` cannot compare with null",
                            op.sql(),
                            field
                        )))
                    }
                    _ => {
                        params.push(value.clone());
                        format!("{} {} ?", field, op.sql())
                    }
                }
            }
        };
        parts.push(part);
    }

    let joined = parts.join(" AND ");
    if parts.len() > 1 {
        Ok(Some(format!("({})", joined)))
    } else {
        Ok(Some(joined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::criteria::SortOrder;
    use crate::model::{ModelBuilder, ModelMetadata, TableDefinition};

    fn model() -> ModelMetadata {
        ModelBuilder::new()
            .table(
                TableDefinition::new("people")
                    .column(
                        "id",
                        Column::new(ColumnType::Integer).primary_key().autoincrement(),
                    )
                    .column("name", Column::new(ColumnType::String))
                    .column("nickname", Column::new(ColumnType::String).nullable())
                    .column("created_on", Column::new(ColumnType::Date).nullable()),
            )
            .table(
                TableDefinition::new("memberships")
                    .column("person_id", Column::new(ColumnType::Integer).primary_key())
                    .column("group_id", Column::new(ColumnType::Integer).primary_key())
                    .column("active", Column::new(ColumnType::Bit)),
            )
            .table(
                TableDefinition::new("tokens")
                    .column(
                        "token",
                        Column::new(ColumnType::String)
                            .primary_key()
                            .generator(|| Value::from("generated")),
                    )
                    .column("weight", Column::new(ColumnType::Float)),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_create_table_autoincrement() {
        let model = model();
        let sql = create_table(model.collection("people").unwrap()).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE people (\n  id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,\n  name TEXT NOT NULL,\n  nickname TEXT NULL,\n  created_on INTEGER NULL\n)"
        );
    }

    #[test]
    fn test_create_table_composite_key() {
        let model = model();
        let sql = create_table(model.collection("memberships").unwrap()).unwrap();
        assert!(sql.contains("PRIMARY KEY (person_id, group_id)"));
        assert!(sql.ends_with(") WITHOUT ROWID"));
        assert!(sql.contains("active INTEGER NOT NULL"));
    }

    #[test]
    fn test_create_table_single_key() {
        let model = model();
        let sql = create_table(model.collection("tokens").unwrap()).unwrap();
        assert!(sql.contains("weight REAL NOT NULL"));
        assert!(sql.ends_with("PRIMARY KEY (token)\n)"));
    }

    #[test]
    fn test_insert_row_skips_autoincrement_and_collects_errors() {
        let model = model();
        let table = model.collection("people").unwrap();
        let mut document = table.new_document();
        let err = insert_row(table, &mut document).unwrap_err();
        match err {
            Error::DataValidation { collection, errors } => {
                assert_eq!(collection, "people");
                assert_eq!(errors.len(), 1);
                assert!(errors[0].starts_with("`name`"));
            }
            other => panic!("unexpected error: {}", other),
        }

        document.set("name", "ada");
        let row = insert_row(table, &mut document).unwrap();
        let names: Vec<&str> = row.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["name", "nickname", "created_on"]);
    }

    #[test]
    fn test_insert_row_rejects_wrong_type() {
        let model = model();
        let table = model.collection("people").unwrap();
        let mut document = table.new_document().with("name", 42);
        let err = insert_row(table, &mut document).unwrap_err();
        assert!(err.to_string().contains("expected a value of type `String`"));
    }

    #[test]
    fn test_insert_row_runs_generators() {
        let model = model();
        let table = model.collection("tokens").unwrap();
        let mut document = table.new_document().with("weight", 0.5);
        let row = insert_row(table, &mut document).unwrap();
        assert_eq!(row[0], ("token".to_string(), Value::from("generated")));
        assert_eq!(document.value("token"), Value::from("generated"));
    }

    #[test]
    fn test_insert_statement() {
        let model = model();
        let table = model.collection("memberships").unwrap();
        let statement = insert(
            table,
            vec![
                ("person_id".to_string(), Value::Integer(1)),
                ("group_id".to_string(), Value::Integer(2)),
            ],
        );
        assert_eq!(
            statement.sql,
            "INSERT INTO memberships (person_id, group_id) VALUES (?, ?)"
        );
        assert_eq!(statement.params.len(), 2);
    }

    #[test]
    fn test_update_statement_uses_key() {
        let model = model();
        let table = model.collection("memberships").unwrap();
        let document = table
            .new_document()
            .with("person_id", 1)
            .with("group_id", 2)
            .with("active", true);
        let row = update_row(table, &document).unwrap();
        let key = table.key_of(&document).unwrap();
        let statement = update(table, row, key).unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE memberships SET active = ? WHERE (person_id = ? AND group_id = ?)"
        );
        assert_eq!(
            statement.params,
            vec![Value::Bit(true), Value::Integer(1), Value::Integer(2)]
        );
    }

    #[test]
    fn test_select_with_options() {
        let model = model();
        let table = model.collection("people").unwrap();
        let options = FindOptions::new()
            .criteria(Criteria::new().eq("name", "ada").gt("id", 3))
            .sort("name", SortOrder::Asc)
            .limit(10)
            .offset(5);
        let statement = select(table, &options).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT id, name, nickname, created_on FROM people WHERE (name = ? AND id > ?) ORDER BY name ASC LIMIT 10 OFFSET 5"
        );
        assert_eq!(statement.params, vec![Value::from("ada"), Value::Integer(3)]);
    }

    #[test]
    fn test_select_offset_without_limit() {
        let model = model();
        let table = model.collection("people").unwrap();
        let statement = select(table, &FindOptions::new().offset(2)).unwrap();
        assert!(statement.sql.ends_with("LIMIT -1 OFFSET 2"));
    }

    #[test]
    fn test_criteria_null_and_in() {
        let model = model();
        let table = model.collection("people").unwrap();
        let mut params = Vec::new();
        let sql = format_criteria(
            table,
            &Criteria::new().eq("nickname", Value::Null),
            &mut params,
        )
        .unwrap();
        assert_eq!(sql.as_deref(), Some("nickname IS NULL"));
        assert!(params.is_empty());

        let sql = format_criteria(table, &Criteria::new().is_in("id", [1, 2]), &mut params).unwrap();
        assert_eq!(sql.as_deref(), Some("id IN (?, ?)"));
        assert_eq!(params.len(), 2);

        let sql = format_criteria(
            table,
            &Criteria::new().is_in("id", Vec::<i64>::new()),
            &mut params,
        )
        .unwrap();
        assert_eq!(sql.as_deref(), Some("0 = 1"));
    }

    #[test]
    fn test_criteria_rejects_unknown_or_unsafe_fields() {
        let model = model();
        let table = model.collection("people").unwrap();
        let mut params = Vec::new();
        assert!(format_criteria(table, &Criteria::new().eq("age", 1), &mut params).is_err());
        assert!(format_criteria(table, &Criteria::new().eq("name; --", 1), &mut params).is_err());
        assert!(
            format_criteria(table, &Criteria::new().gt("nickname", Value::Null), &mut params)
                .is_err()
        );
    }

    #[test]
    fn test_count_and_delete() {
        let model = model();
        let table = model.collection("people").unwrap();
        let statement = count(table, &Criteria::new()).unwrap();
        assert_eq!(statement.sql, "SELECT COUNT(*) FROM people");

        let statement = delete(table, vec![("id".to_string(), Value::Integer(7))]).unwrap();
        assert_eq!(statement.sql, "DELETE FROM people WHERE id = ?");
        assert!(delete(table, Vec::new()).is_err());
    }
}
