use rusqlite::Connection;
use std::env;
use std::fs;
use std::path::Path;

fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    println!("Starting database migration...");

    let db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "cerfa_filler.sqlite3".to_string());
    println!("Opening database at {}...", db_path);
    let mut conn = Connection::open(&db_path)
        .map_err(|e| anyhow::anyhow!("Failed to open database {}: {}", db_path, e))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    // In Docker, this will be at /app/migrations/init.sql
    let migration_path = env::var("MIGRATION_FILE").unwrap_or_else(|_| "migrations/init.sql".to_string());

    if !Path::new(&migration_path).exists() {
        println!("Migration file not found at: {}", migration_path);
        return Ok(());
    }

    let sql_content = fs::read_to_string(&migration_path)?;
    let statements = split_statements(&sql_content);

    let tx = conn.transaction()?;
    for sql in statements {
        println!("Executing: {:.50}...", sql);
        tx.execute_batch(sql)
            .map_err(|e| anyhow::anyhow!("Migration failed on {:.50}: {}", sql, e))?;
    }
    tx.commit()?;

    println!("Migration complete and committed.");
    Ok(())
}

/// Splits a script on `;`, dropping blank statements and `--` comment lines.
fn split_statements(script: &str) -> Vec<&str> {
    script
        .split(';')
        .map(|s| s.trim())
        .filter(|s| s.lines().any(|line| !line.trim().is_empty() && !line.trim_start().starts_with("--")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blanks_are_skipped() {
        let script = "-- schema\nCREATE TABLE a (id INTEGER);\n\n-- trailing comment\n;\nCREATE INDEX i ON a (id);\n";
        let statements = split_statements(script);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].ends_with("CREATE TABLE a (id INTEGER)"));
        assert_eq!(statements[1], "CREATE INDEX i ON a (id)");
    }

    #[test]
    fn bundled_schema_applies_twice() {
        let conn = Connection::open_in_memory().unwrap();
        let script = include_str!("../../migrations/init.sql");
        for _ in 0..2 {
            for sql in split_statements(script) {
                conn.execute_batch(sql).unwrap();
            }
        }
    }
}
