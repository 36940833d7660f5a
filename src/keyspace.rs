//! A named registry of tables.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::table::Table;

#[derive(Debug)]
pub struct Keyspace {
    name: String,
    tables: RwLock<BTreeMap<String, Arc<Table>>>,
}

impl Keyspace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a table. With `check_exists` set an existing table is left
    /// in place; otherwise a name collision is an error.
    pub fn add_table(&self, table: Table, check_exists: bool) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(table.name()) {
            if check_exists {
                return Ok(());
            }
            return Err(Error::AlreadyExists(format!(
                "Table \"{}.{}\" already exists",
                self.name,
                table.name()
            )));
        }
        tracing::debug!(keyspace = %self.name, table = %table.name(), "creating table");
        tables.insert(table.name().to_string(), Arc::new(table));
        Ok(())
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        match self.tables.write().remove(name) {
            Some(_) => Ok(()),
            None => Err(Error::invalid(format!(
                "Unknown table \"{}.{name}\"",
                self.name
            ))),
        }
    }

    pub fn table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.read().get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }
}
