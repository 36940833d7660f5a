//! Statement routing: a session resolves keyspace and table names, executes
//! parsed statements against the table engine, and wraps results in a
//! [`ResultPage`].
//!
//! The `*_async` methods complete before returning; they exist so async
//! driver call sites can run against the mock unchanged.

use std::sync::Arc;

use crate::cluster::Cluster;
use crate::error::{Error, Result};
use crate::keyspace::Keyspace;
use crate::result::ResultPage;
use crate::statement::{Assignment, Batch, Filter, Statement, StatementArgs};
use crate::table::{self, ColumnType, Table};
use crate::value::{Row, Value};

pub struct Session {
    cluster: Arc<Cluster>,
    keyspace: Option<String>,
}

impl Session {
    pub(crate) fn new(cluster: Arc<Cluster>, keyspace: Option<String>) -> Self {
        Self { cluster, keyspace }
    }

    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    pub fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    /// Parse a statement without binding any parameters; `?` markers stay
    /// pending until `bind`/`fill_params` or execution-time parameters
    /// supply them.
    pub fn prepare(&self, cql: &str) -> Result<Statement> {
        Statement::new(cql, &[])
    }

    pub async fn prepare_async(&self, cql: &str) -> Result<Statement> {
        self.prepare(cql)
    }

    /// Execute a prepared statement. Non-empty `params` fill the
    /// statement's pending markers first; a marker that is still pending
    /// when execution reaches it is an error.
    pub fn execute(&self, statement: &Statement, params: &[Value]) -> Result<ResultPage> {
        let statement = if params.is_empty() {
            statement.clone()
        } else {
            statement.fill_params(params)?
        };
        tracing::debug!(cql = %statement.cql, "executing statement");
        self.dispatch(&statement)
    }

    pub async fn execute_async(
        &self,
        statement: &Statement,
        params: &[Value],
    ) -> Result<ResultPage> {
        self.execute(statement, params)
    }

    /// Parse and execute in one call.
    pub fn execute_query(&self, cql: &str, params: &[Value]) -> Result<ResultPage> {
        self.execute(&Statement::new(cql, params)?, &[])
    }

    /// Execute every statement in the batch in order, stopping at the first
    /// failure.
    pub fn execute_batch(&self, batch: &Batch) -> Result<ResultPage> {
        for (statement, params) in batch.statements() {
            self.execute(statement, params)?;
        }
        Ok(ResultPage::default())
    }

    fn dispatch(&self, statement: &Statement) -> Result<ResultPage> {
        match &statement.args {
            StatementArgs::CreateKeyspace {
                keyspace,
                check_exists,
            } => {
                self.cluster.add_keyspace(keyspace, *check_exists)?;
                Ok(ResultPage::default())
            }
            StatementArgs::DropKeyspace { keyspace } => {
                self.cluster.drop_keyspace(keyspace)?;
                Ok(ResultPage::default())
            }
            StatementArgs::CreateTable {
                keyspace,
                table,
                check_exists,
                columns,
                partition_key,
                clustering_key,
            } => {
                let keyspace = self.resolve_keyspace(keyspace.as_deref(), table)?;
                let built = Table::new(
                    keyspace.name(),
                    table.clone(),
                    columns.clone(),
                    partition_key.clone(),
                    clustering_key.clone(),
                )?;
                keyspace.add_table(built, *check_exists)?;
                Ok(ResultPage::default())
            }
            StatementArgs::DropTable { keyspace, table } => {
                let keyspace = self.resolve_keyspace(keyspace.as_deref(), table)?;
                keyspace.drop_table(table)?;
                Ok(ResultPage::default())
            }
            StatementArgs::Truncate { keyspace, table } => {
                self.resolve_table(keyspace.as_deref(), table)?.clear();
                Ok(ResultPage::default())
            }
            StatementArgs::Insert {
                keyspace,
                table,
                values,
                check_exists,
            } => {
                let table = self.resolve_table(keyspace.as_deref(), table)?;
                let mut row = Row::new();
                for (column, term) in values {
                    row.insert(column.clone(), term.value()?.clone());
                }
                let applied = table.insert(row, *check_exists)?;
                if *check_exists {
                    Ok(ResultPage::applied_page(applied))
                } else {
                    Ok(ResultPage::default())
                }
            }
            StatementArgs::Select {
                keyspace,
                table,
                columns,
                filter,
                order,
                limit,
            } => {
                let table = self.resolve_table(keyspace.as_deref(), table)?;
                let rows = table.select(columns, filter, order, *limit)?;
                Ok(ResultPage::new(rows))
            }
            StatementArgs::Delete {
                keyspace,
                table,
                filter,
            } => {
                let table = self.resolve_table(keyspace.as_deref(), table)?;
                table.delete(filter)?;
                Ok(ResultPage::default())
            }
            StatementArgs::Update {
                keyspace,
                table,
                assignments,
                filter,
            } => {
                let table = self.resolve_table(keyspace.as_deref(), table)?;
                self.update(&table, assignments, filter)
            }
        }
    }

    /// Updates are routed as select-then-reinsert. When no stored row
    /// matches, the filter's equality values seed a fresh row, so an update
    /// against an absent primary key upserts.
    fn update(
        &self,
        table: &Table,
        assignments: &[(String, Assignment)],
        filter: &Filter,
    ) -> Result<ResultPage> {
        let star = ["*".to_string()];
        let mut rows = table.select(&star, filter, &[], None)?;
        if rows.is_empty() {
            rows.push(table::seed_row(filter)?);
        }

        for row in rows {
            let mut updated = row;
            for (column, assignment) in assignments {
                let kind = table.column_type(column).ok_or_else(|| {
                    Error::invalid(format!(
                        "Unknown column \"{}\" in table \"{}\"",
                        column,
                        table.name()
                    ))
                })?;
                match assignment {
                    Assignment::Set(term) => {
                        if kind == ColumnType::Counter {
                            return Err(Error::invalid(format!(
                                "Cannot directly overwrite counter column \"{column}\""
                            )));
                        }
                        updated.insert(column.clone(), term.value()?.clone());
                    }
                    Assignment::Counter(arithmetic) => {
                        if kind != ColumnType::Counter {
                            return Err(Error::invalid(format!(
                                "Cannot apply arithmetic to non-counter column \"{column}\""
                            )));
                        }
                        updated = arithmetic.apply(&updated)?;
                    }
                }
            }
            table.upsert(updated)?;
        }
        Ok(ResultPage::default())
    }

    fn resolve_keyspace(
        &self,
        explicit: Option<&str>,
        table: &str,
    ) -> Result<Arc<Keyspace>> {
        let name = explicit.or(self.keyspace.as_deref()).ok_or_else(|| {
            Error::invalid(format!("No keyspace specified for table \"{table}\""))
        })?;
        self.cluster
            .keyspace(name)
            .ok_or_else(|| Error::invalid(format!("Unknown keyspace \"{name}\"")))
    }

    fn resolve_table(&self, explicit: Option<&str>, table: &str) -> Result<Arc<Table>> {
        let keyspace = self.resolve_keyspace(explicit, table)?;
        keyspace.table(table).ok_or_else(|| {
            Error::invalid(format!("Unknown table \"{}.{table}\"", keyspace.name()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let cluster = Cluster::new();
        cluster.add_keyspace("store", false).unwrap();
        cluster.connect_keyspace("store").unwrap()
    }

    fn books_session() -> Session {
        let session = session();
        session
            .execute_query(
                "CREATE TABLE books (pk1 text, ck1 text, field1 text, PRIMARY KEY (pk1, ck1))",
                &[],
            )
            .unwrap();
        session
    }

    #[test]
    fn create_insert_select_round_trip() {
        let session = books_session();
        session
            .execute_query(
                "INSERT INTO books (pk1, ck1, field1) VALUES ('fiction', 'Dune', 'Herbert')",
                &[],
            )
            .unwrap();
        let page = session
            .execute_query("SELECT * FROM books WHERE pk1 = 'fiction'", &[])
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["field1"], Value::from("Herbert"));
    }

    #[test]
    fn unqualified_names_resolve_against_the_default_keyspace() {
        let cluster = Cluster::new();
        cluster.add_keyspace("store", false).unwrap();
        let bare = cluster.connect();
        let err = bare
            .execute_query("CREATE TABLE books (pk1 text PRIMARY KEY)", &[])
            .unwrap_err();
        assert_eq!(
            err,
            Error::Invalid("No keyspace specified for table \"books\"".into())
        );
        bare.execute_query("CREATE TABLE store.books (pk1 text PRIMARY KEY)", &[])
            .unwrap();
    }

    #[test]
    fn prepared_statement_executes_with_late_parameters() {
        let session = books_session();
        let insert = session
            .prepare("INSERT INTO books (pk1, ck1, field1) VALUES (?, ?, ?)")
            .unwrap();
        session
            .execute(
                &insert,
                &[
                    Value::from("fiction"),
                    Value::from("Dune"),
                    Value::from("Herbert"),
                ],
            )
            .unwrap();
        let select = session
            .prepare("SELECT field1 FROM books WHERE pk1 = ? AND ck1 = ?")
            .unwrap();
        let page = session
            .execute(&select, &[Value::from("fiction"), Value::from("Dune")])
            .unwrap();
        assert_eq!(page[0]["field1"], Value::from("Herbert"));
    }

    #[test]
    fn executing_with_unbound_parameters_is_an_error() {
        let session = books_session();
        let insert = session
            .prepare("INSERT INTO books (pk1, ck1, field1) VALUES (?, ?, ?)")
            .unwrap();
        let err = session.execute(&insert, &[]).unwrap_err();
        assert_eq!(
            err,
            Error::Invalid("Cannot execute a statement with unbound parameters".into())
        );

        // a pending marker inside a range comparator errors too, even when
        // matching rows exist
        session
            .execute_query(
                "INSERT INTO books (pk1, ck1, field1) VALUES ('fiction', 'Dune', 'Herbert')",
                &[],
            )
            .unwrap();
        let select = session
            .prepare("SELECT * FROM books WHERE pk1 = 'fiction' AND ck1 > ?")
            .unwrap();
        let err = session.execute(&select, &[]).unwrap_err();
        assert_eq!(
            err,
            Error::Invalid("Cannot execute a statement with unbound parameters".into())
        );
    }

    #[test]
    fn conditional_insert_reports_applied() {
        let session = books_session();
        let cql =
            "INSERT INTO books (pk1, ck1, field1) VALUES ('fiction', 'Dune', 'Herbert') IF NOT EXISTS";
        let page = session.execute_query(cql, &[]).unwrap();
        assert!(page.applied());
        let page = session.execute_query(cql, &[]).unwrap();
        assert!(!page.applied());
    }

    #[test]
    fn update_overwrites_matching_rows() {
        let session = books_session();
        session
            .execute_query(
                "INSERT INTO books (pk1, ck1, field1) VALUES ('fiction', 'Dune', 'old')",
                &[],
            )
            .unwrap();
        session
            .execute_query(
                "UPDATE books SET field1 = 'new' WHERE pk1 = 'fiction' AND ck1 = 'Dune'",
                &[],
            )
            .unwrap();
        let page = session
            .execute_query("SELECT * FROM books WHERE pk1 = 'fiction'", &[])
            .unwrap();
        assert_eq!(page[0]["field1"], Value::from("new"));
    }

    #[test]
    fn update_upserts_when_no_row_matches() {
        let session = books_session();
        session
            .execute_query(
                "UPDATE books SET field1 = 'fresh' WHERE pk1 = 'fiction' AND ck1 = 'Dune'",
                &[],
            )
            .unwrap();
        let page = session
            .execute_query("SELECT * FROM books WHERE pk1 = 'fiction'", &[])
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["field1"], Value::from("fresh"));
    }

    #[test]
    fn counter_updates_accumulate_from_zero() {
        let session = session();
        session
            .execute_query(
                "CREATE TABLE counters (pk text PRIMARY KEY, n counter)",
                &[],
            )
            .unwrap();
        session
            .execute_query("UPDATE counters SET n = n + 3 WHERE pk = 'x'", &[])
            .unwrap();
        session
            .execute_query("UPDATE counters SET n = n + 2 WHERE pk = 'x'", &[])
            .unwrap();
        let page = session
            .execute_query("SELECT * FROM counters WHERE pk = 'x'", &[])
            .unwrap();
        assert_eq!(page[0]["n"], Value::Int(5));
    }

    #[test]
    fn arithmetic_on_a_non_counter_column_is_rejected() {
        let session = session();
        session
            .execute_query("CREATE TABLE plain (pk text PRIMARY KEY, n int)", &[])
            .unwrap();
        let err = session
            .execute_query("UPDATE plain SET n = n + 3 WHERE pk = 'x'", &[])
            .unwrap_err();
        assert_eq!(
            err,
            Error::Invalid("Cannot apply arithmetic to non-counter column \"n\"".into())
        );
    }

    #[test]
    fn counter_columns_cannot_be_set_directly() {
        let session = session();
        session
            .execute_query(
                "CREATE TABLE counters (pk text PRIMARY KEY, n counter)",
                &[],
            )
            .unwrap();
        let err = session
            .execute_query("UPDATE counters SET n = 7 WHERE pk = 'x'", &[])
            .unwrap_err();
        assert_eq!(
            err,
            Error::Invalid("Cannot directly overwrite counter column \"n\"".into())
        );
        let err = session
            .execute_query("INSERT INTO counters (pk, n) VALUES ('x', 1)", &[])
            .unwrap_err();
        assert_eq!(
            err,
            Error::Invalid("INSERT statements are not allowed on counter tables".into())
        );
    }

    #[test]
    fn delete_and_truncate() {
        let session = books_session();
        session
            .execute_query(
                "INSERT INTO books (pk1, ck1, field1) VALUES ('fiction', 'Dune', 'x')",
                &[],
            )
            .unwrap();
        session
            .execute_query(
                "INSERT INTO books (pk1, ck1, field1) VALUES ('fiction', 'Hyperion', 'y')",
                &[],
            )
            .unwrap();
        session
            .execute_query(
                "DELETE FROM books WHERE pk1 = 'fiction' AND ck1 = 'Dune'",
                &[],
            )
            .unwrap();
        let page = session
            .execute_query("SELECT * FROM books WHERE pk1 = 'fiction'", &[])
            .unwrap();
        assert_eq!(page.len(), 1);

        session.execute_query("TRUNCATE books", &[]).unwrap();
        let page = session
            .execute_query("SELECT * FROM books WHERE pk1 = 'fiction'", &[])
            .unwrap();
        assert!(page.is_empty());
    }

    #[test]
    fn batches_execute_in_order() {
        let session = books_session();
        let insert = session
            .prepare("INSERT INTO books (pk1, ck1, field1) VALUES (?, ?, ?)")
            .unwrap();
        let mut batch = Batch::new();
        batch.add(
            insert.clone(),
            vec![Value::from("a"), Value::from("b"), Value::from("one")],
        );
        batch.add(
            insert,
            vec![Value::from("a"), Value::from("c"), Value::from("two")],
        );
        session.execute_batch(&batch).unwrap();
        let page = session
            .execute_query("SELECT * FROM books WHERE pk1 = 'a'", &[])
            .unwrap();
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn drop_table_and_keyspace() {
        let session = books_session();
        session.execute_query("DROP TABLE books", &[]).unwrap();
        let err = session
            .execute_query("SELECT * FROM books", &[])
            .unwrap_err();
        assert_eq!(err, Error::Invalid("Unknown table \"store.books\"".into()));
        session.execute_query("DROP KEYSPACE store", &[]).unwrap();
        assert!(session.cluster().keyspace("store").is_none());
    }
}
