use std::sync::Once;

use cass_mock::{Cluster, Session};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A session connected to a fresh cluster with a `store` keyspace.
pub fn store_session() -> Session {
    init_tracing();
    let cluster = Cluster::new();
    cluster.add_keyspace("store", false).unwrap();
    cluster.connect_keyspace("store").unwrap()
}

/// A `store` session with the standard three-level test table created.
#[allow(dead_code)]
pub fn books_session() -> Session {
    let session = store_session();
    session
        .execute_query(
            "CREATE TABLE books (pk1 text, ck1 text, ck2 int, field1 text, \
             PRIMARY KEY (pk1, ck1, ck2))",
            &[],
        )
        .unwrap();
    session
}
