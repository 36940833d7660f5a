//! The top-level keyspace registry and session factory.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::keyspace::Keyspace;
use crate::session::Session;

/// An in-process stand-in for a database cluster. Cheap to construct; every
/// session connected to it shares its keyspaces.
#[derive(Debug, Default)]
pub struct Cluster {
    keyspaces: RwLock<BTreeMap<String, Arc<Keyspace>>>,
}

impl Cluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a keyspace. With `check_exists` set an existing keyspace is
    /// left in place; otherwise a name collision is an error.
    pub fn add_keyspace(&self, name: &str, check_exists: bool) -> Result<()> {
        let mut keyspaces = self.keyspaces.write();
        if keyspaces.contains_key(name) {
            if check_exists {
                return Ok(());
            }
            return Err(Error::AlreadyExists(format!(
                "Keyspace \"{name}\" already exists"
            )));
        }
        tracing::debug!(keyspace = %name, "creating keyspace");
        keyspaces.insert(name.to_string(), Arc::new(Keyspace::new(name)));
        Ok(())
    }

    pub fn drop_keyspace(&self, name: &str) -> Result<()> {
        match self.keyspaces.write().remove(name) {
            Some(_) => Ok(()),
            None => Err(Error::invalid(format!("Unknown keyspace \"{name}\""))),
        }
    }

    pub fn keyspace(&self, name: &str) -> Option<Arc<Keyspace>> {
        self.keyspaces.read().get(name).cloned()
    }

    pub fn keyspace_names(&self) -> Vec<String> {
        self.keyspaces.read().keys().cloned().collect()
    }

    /// Open a session with no default keyspace; statements must use
    /// namespaced table names.
    pub fn connect(self: &Arc<Self>) -> Session {
        Session::new(self.clone(), None)
    }

    /// Open a session whose unqualified table names resolve against
    /// `keyspace`, which must already exist.
    pub fn connect_keyspace(self: &Arc<Self>, keyspace: &str) -> Result<Session> {
        if self.keyspace(keyspace).is_none() {
            return Err(Error::invalid(format!("Unknown keyspace \"{keyspace}\"")));
        }
        Ok(Session::new(self.clone(), Some(keyspace.to_string())))
    }
}
