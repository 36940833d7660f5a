//! An in-process mock of a column-family database's query layer.
//!
//! Query text is tokenized and parsed into a [`Statement`], optionally bound
//! with positional parameters, and executed by a [`Session`] against
//! in-memory [`Table`] storage that enforces the same data-modeling rules a
//! real cluster would: partition/clustering key filter legality, counter
//! discipline, and `IF NOT EXISTS` semantics.

pub mod cluster;
pub mod error;
pub mod keyspace;
pub mod result;
pub mod session;
pub mod statement;
pub mod table;
pub mod token;
pub mod tokenizer;
pub mod value;

pub use cluster::Cluster;
pub use error::{Error, Result};
pub use keyspace::Keyspace;
pub use result::ResultPage;
pub use session::Session;
pub use statement::{Action, Batch, Statement};
pub use table::{Column, ColumnType, Table};
pub use value::{Row, Term, Value};
