//! Table creation from entity definitions.

use super::DbResult;
use crate::definition::{DefinitionRegistry, EntityDefinition};
use log::info;
use rusqlite::Connection;

/// Quotes an identifier for SQL text.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Creates the table for `definition` when it does not exist yet.
///
/// The identity column is an `INTEGER PRIMARY KEY`, so it aliases `rowid`.
pub fn ensure_table(conn: &Connection, definition: &EntityDefinition) -> DbResult<()> {
    conn.execute_batch(&create_table_sql(definition))?;
    Ok(())
}

/// Creates every registered table inside one transaction.
pub fn ensure_tables(conn: &mut Connection, registry: &DefinitionRegistry) -> DbResult<()> {
    let tx = conn.transaction()?;
    for definition in registry.iter() {
        tx.execute_batch(&create_table_sql(definition))?;
    }
    tx.commit()?;
    info!(
        "event=schema_ensure module=db status=ok tables={}",
        registry.len()
    );
    Ok(())
}

fn create_table_sql(definition: &EntityDefinition) -> String {
    let identity_column = definition.identity_column();
    let columns = definition
        .fields
        .iter()
        .map(|field| {
            let column = field.column_name();
            if column == identity_column {
                format!("{} INTEGER PRIMARY KEY", quote_identifier(column))
            } else {
                format!(
                    "{} {}",
                    quote_identifier(column),
                    field.field_type.sql_type()
                )
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({columns});",
        quote_identifier(&definition.table)
    )
}

#[cfg(test)]
mod tests {
    use super::{create_table_sql, ensure_table, quote_identifier};
    use crate::definition::EntityDefinition;
    use rusqlite::Connection;

    fn definition() -> EntityDefinition {
        EntityDefinition::from_json_str(
            r#"{
                "name": "Article",
                "fields": [
                    { "name": "id", "type": "integer" },
                    { "name": "title", "type": "text", "column": "headline" },
                    { "name": "hits", "type": "integer" }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn identity_column_becomes_primary_key() {
        let sql = create_table_sql(&definition());
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"articles\""));
        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY"));
        assert!(sql.contains("\"headline\" TEXT"));
    }

    #[test]
    fn ensure_table_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_table(&conn, &definition()).unwrap();
        ensure_table(&conn, &definition()).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'articles';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
