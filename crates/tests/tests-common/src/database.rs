//! Temporary SQLite databases.

use sqlx::{Connection, Row, SqliteConnection};

/// The tables most tests run against. `Table_Name1` has an integer key,
/// `Table_Name2` a string key.
pub const SAMPLE_SCHEMA: &[&str] = &[
    "CREATE TABLE Table_Name1 (id INTEGER PRIMARY KEY, str_col VARCHAR(256), num_col INT)",
    "CREATE TABLE Table_Name2 (id VARCHAR(36) PRIMARY KEY, ref_name VARCHAR(256))",
    "INSERT INTO Table_Name1 VALUES (1, 'value1', 1), (2, 'value2', 2), (3, 'xfoo', 3)",
    "INSERT INTO Table_Name2 VALUES ('a', 'ref name1')",
];

/// A database file in a temporary directory, removed on drop.
pub struct TestDatabase {
    directory: tempfile::TempDir,
    pub uri: String,
}

impl TestDatabase {
    /// Create a database and run `statements` against it.
    pub async fn new(statements: &[&str]) -> anyhow::Result<TestDatabase> {
        let directory = tempfile::tempdir()?;
        let uri = format!(
            "sqlite://{}?mode=rwc",
            directory.path().join("odata.db").display()
        );
        let database = TestDatabase { directory, uri };
        for statement in statements {
            database.execute(statement).await?;
        }
        Ok(database)
    }

    /// A database holding [`SAMPLE_SCHEMA`].
    pub async fn sample() -> anyhow::Result<TestDatabase> {
        TestDatabase::new(SAMPLE_SCHEMA).await
    }

    /// A scratch directory next to the database, for configuration files.
    pub fn directory(&self) -> &std::path::Path {
        self.directory.path()
    }

    pub async fn execute(&self, statement: &str) -> anyhow::Result<()> {
        let mut connection = SqliteConnection::connect(&self.uri).await?;
        sqlx::query(statement).execute(&mut connection).await?;
        connection.close().await?;
        Ok(())
    }

    pub async fn count(&self, table: &str) -> anyhow::Result<i64> {
        let mut connection = SqliteConnection::connect(&self.uri).await?;
        let row = sqlx::query(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&mut connection)
            .await?;
        connection.close().await?;
        Ok(row.try_get(0)?)
    }
}
