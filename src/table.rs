//! In-memory storage for a single table.
//!
//! A table owns a map from partition-key tuple to [`Partition`]. Partitions
//! are created lazily on first access and shared by every operation touching
//! that key, so at most one container ever exists per partition key even
//! under racing first-access. Within a partition, records are keyed by the
//! full clustering-column tuple in declared order, which keeps them in
//! clustering order for free.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::statement::{ColumnRef, Filter, Restriction, SortOrder};
use crate::value::{Row, Term, Value};

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Int,
    Double,
    Timestamp,
    Uuid,
    Counter,
}

impl ColumnType {
    /// Resolve a CQL type name. Sizes and legacy aliases collapse onto the
    /// nearest storage representation.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "text" | "varchar" | "ascii" => Ok(ColumnType::Text),
            "int" | "bigint" | "smallint" | "tinyint" | "varint" => Ok(ColumnType::Int),
            "double" | "float" | "decimal" => Ok(ColumnType::Double),
            "timestamp" => Ok(ColumnType::Timestamp),
            "uuid" | "timeuuid" => Ok(ColumnType::Uuid),
            "counter" => Ok(ColumnType::Counter),
            other => Err(Error::invalid(format!("Unknown column type \"{other}\""))),
        }
    }

    /// Whether a non-null value is acceptable for this column type.
    fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnType::Text, Value::Text(_)) => true,
            (ColumnType::Int, Value::Int(_)) => true,
            (ColumnType::Double, Value::Float(_) | Value::Int(_)) => true,
            (ColumnType::Timestamp, Value::Timestamp(_) | Value::Int(_)) => true,
            (ColumnType::Uuid, Value::Uuid(_)) => true,
            (ColumnType::Counter, Value::Int(_)) => true,
            _ => false,
        }
    }

    /// Coerce a value to the column's storage representation, so a filter
    /// written with one numeric spelling finds rows stored with another.
    fn normalize(&self, value: Value) -> Value {
        match (self, value) {
            (ColumnType::Double, Value::Int(n)) => Value::Float(n as f64),
            (ColumnType::Timestamp, Value::Int(n)) => Value::Timestamp(n),
            (_, value) => value,
        }
    }
}

/// Schema metadata for one declared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
}

/// One partition's records, keyed by the clustering-column tuple. The lock
/// makes the read-modify-write inside `insert` (overwrite vs reject) atomic
/// per partition; operations on different partitions never contend.
#[derive(Debug, Default)]
struct Partition {
    records: Mutex<std::collections::BTreeMap<Vec<Value>, Row>>,
}

/// A single table: schema plus owned storage.
#[derive(Debug)]
pub struct Table {
    keyspace: String,
    name: String,
    columns: Vec<Column>,
    partition_key: Vec<String>,
    clustering_key: Vec<String>,
    partitions: RwLock<HashMap<Vec<Value>, Arc<Partition>>>,
}

impl Table {
    /// Build a table from its declared columns and primary-key layout.
    ///
    /// A counter table (any non-key column typed `counter`) may not carry
    /// non-counter regular columns alongside.
    pub fn new(
        keyspace: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<(String, ColumnType)>,
        partition_key: Vec<String>,
        clustering_key: Vec<String>,
    ) -> Result<Self> {
        let name = name.into();
        let columns: Vec<Column> = columns
            .into_iter()
            .map(|(name, kind)| Column { name, kind })
            .collect();

        for key_part in partition_key.iter().chain(clustering_key.iter()) {
            if !columns.iter().any(|c| &c.name == key_part) {
                return Err(Error::invalid(format!(
                    "Unknown PRIMARY KEY column \"{key_part}\" in table \"{name}\""
                )));
            }
        }

        let key_column = |c: &Column| {
            partition_key.contains(&c.name) || clustering_key.contains(&c.name)
        };
        let fields: Vec<&Column> = columns.iter().filter(|c| !key_column(c)).collect();
        let has_counter = fields.iter().any(|c| c.kind == ColumnType::Counter);
        if has_counter && fields.iter().any(|c| c.kind != ColumnType::Counter) {
            return Err(Error::Configuration(format!(
                "Cannot mix counter and non-counter columns in table \"{name}\""
            )));
        }

        Ok(Self {
            keyspace: keyspace.into(),
            name,
            columns,
            partition_key,
            clustering_key,
            partitions: RwLock::new(HashMap::new()),
        })
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_key(&self) -> &[String] {
        &self.partition_key
    }

    pub fn clustering_columns(&self) -> &[String] {
        &self.clustering_key
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.kind)
    }

    /// A bound term's value, coerced to the column's storage representation.
    fn stored_value(&self, column: &str, term: &Term) -> Result<Value> {
        let value = term.value()?.clone();
        Ok(match self.column_type(column) {
            Some(kind) => kind.normalize(value),
            None => value,
        })
    }

    /// True when any regular column is counter-typed.
    pub fn is_counter_table(&self) -> bool {
        self.columns.iter().any(|c| {
            c.kind == ColumnType::Counter
                && !self.partition_key.contains(&c.name)
                && !self.clustering_key.contains(&c.name)
        })
    }

    /// Store a row.
    ///
    /// Returns `false` without touching the stored record when
    /// `check_exists` is set and a record already exists at the same primary
    /// key; otherwise overwrites and returns `true`.
    pub fn insert(&self, attributes: Row, check_exists: bool) -> Result<bool> {
        if self.is_counter_table() {
            return Err(Error::invalid(
                "INSERT statements are not allowed on counter tables",
            ));
        }
        self.store(attributes, check_exists)
    }

    /// Internal write path shared by `insert` and the update routing layer;
    /// bypasses the counter-table insert rejection.
    pub(crate) fn upsert(&self, attributes: Row) -> Result<bool> {
        self.store(attributes, false)
    }

    fn store(&self, attributes: Row, check_exists: bool) -> Result<bool> {
        self.validate_attributes(&attributes)?;
        let attributes: Row = attributes
            .into_iter()
            .map(|(name, value)| {
                let value = match self.column_type(&name) {
                    Some(kind) => kind.normalize(value),
                    None => value,
                };
                (name, value)
            })
            .collect();

        let partition_key = self.key_tuple(&self.partition_key, &attributes);
        let clustering_key = self.key_tuple(&self.clustering_key, &attributes);

        let partition = self.partition(partition_key);
        let mut records = partition.records.lock();
        if check_exists && records.contains_key(&clustering_key) {
            return Ok(false);
        }
        records.insert(clustering_key, attributes);
        Ok(true)
    }

    fn validate_attributes(&self, attributes: &Row) -> Result<()> {
        for (name, value) in attributes {
            let column = self
                .columns
                .iter()
                .find(|c| &c.name == name)
                .ok_or_else(|| {
                    Error::invalid(format!(
                        "Unknown column \"{}\" in table \"{}\"",
                        name, self.name
                    ))
                })?;
            if !column.kind.admits(value) {
                return Err(Error::invalid(format!(
                    "Invalid value {value} for column \"{name}\""
                )));
            }
        }

        let null_parts: Vec<&String> = self
            .partition_key
            .iter()
            .chain(self.clustering_key.iter())
            .filter(|part| {
                matches!(attributes.get(part.as_str()), None | Some(Value::Null))
            })
            .collect();
        if !null_parts.is_empty() {
            return Err(Error::invalid(format!(
                "Invalid null primary key part(s) {}",
                quoted(null_parts.iter().map(|s| s.as_str()))
            )));
        }
        Ok(())
    }

    fn key_tuple(&self, key: &[String], attributes: &Row) -> Vec<Value> {
        key.iter()
            .map(|part| attributes.get(part.as_str()).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// The partition for a key, created on first access.
    fn partition(&self, key: Vec<Value>) -> Arc<Partition> {
        if let Some(partition) = self.partitions.read().get(&key) {
            return partition.clone();
        }
        self.partitions
            .write()
            .entry(key)
            .or_insert_with(Arc::default)
            .clone()
    }

    fn existing_partition(&self, key: &[Value]) -> Option<Arc<Partition>> {
        self.partitions.read().get(key).cloned()
    }

    /// Run a query: validate the ORDER BY and filter, gather matching rows,
    /// sort by primary key with the requested direction flips, truncate to
    /// `limit`, and project to `columns` (`*` selects everything).
    pub fn select(
        &self,
        columns: &[String],
        filter: &Filter,
        order: &[(String, SortOrder)],
        limit: Option<usize>,
    ) -> Result<Vec<Row>> {
        self.validate_order(order)?;
        if !filter.is_empty() {
            self.validate_filter(filter)?;
        }

        let mut rows = self.matching_rows(filter)?;
        self.sort_rows(&mut rows, order);
        if let Some(limit) = limit {
            rows.truncate(limit);
        }

        if columns.iter().any(|c| c == "*") {
            return Ok(rows);
        }
        for column in columns {
            if !self.columns.iter().any(|c| &c.name == column) {
                return Err(Error::invalid(format!(
                    "Unknown column \"{}\" in table \"{}\"",
                    column, self.name
                )));
            }
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| (c.clone(), row.get(c.as_str()).cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect())
    }

    /// Remove every record matching the filter. Filter legality rules are
    /// the same as for `select`.
    pub fn delete(&self, filter: &Filter) -> Result<()> {
        if filter.is_empty() {
            return Err(Error::invalid(format!(
                "Missing partition key part(s) {}",
                quoted(self.partition_key.iter().map(|s| s.as_str()))
            )));
        }
        self.validate_filter(filter)?;
        let residual = self.residual_entries(filter);
        ensure_bound(&residual)?;
        for key in self.partition_keys(filter)? {
            if let Some(partition) = self.existing_partition(&key) {
                let mut records = partition.records.lock();
                let mut doomed = Vec::new();
                for (cluster, row) in records.iter() {
                    let mut matched = true;
                    for entry in &residual {
                        if !row_matches(entry, row)? {
                            matched = false;
                            break;
                        }
                    }
                    if matched {
                        doomed.push(cluster.clone());
                    }
                }
                for cluster in doomed {
                    records.remove(&cluster);
                }
            }
        }
        Ok(())
    }

    /// Drop every partition.
    pub fn clear(&self) {
        self.partitions.write().clear();
    }

    fn validate_order(&self, order: &[(String, SortOrder)]) -> Result<()> {
        if order.is_empty() {
            return Ok(());
        }
        for (column, _) in order {
            if self.partition_key.contains(column) {
                return Err(Error::invalid(format!(
                    "Cannot order by partition key column \"{column}\""
                )));
            }
            if !self.columns.iter().any(|c| &c.name == column) {
                return Err(Error::invalid(format!(
                    "Cannot order by unknown column \"{column}\""
                )));
            }
        }
        let prefix_matches = order.len() <= self.clustering_key.len()
            && order
                .iter()
                .zip(self.clustering_key.iter())
                .all(|((column, _), expected)| column == expected);
        if !prefix_matches {
            return Err(Error::invalid(
                "ORDER BY columns must be an in-order prefix of the clustering key",
            ));
        }
        if order.iter().any(|(_, dir)| *dir != order[0].1) {
            return Err(Error::invalid(
                "Ordering direction must be uniform across ORDER BY columns",
            ));
        }
        Ok(())
    }

    fn validate_filter(&self, filter: &Filter) -> Result<()> {
        // partition key: every part present, equality-restricted, and only
        // the last part may carry an IN restriction
        let missing: Vec<&str> = self
            .partition_key
            .iter()
            .filter(|part| filter.get(part).is_none())
            .map(|s| s.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(Error::invalid(format!(
                "Missing partition key part(s) {}",
                quoted(missing.into_iter())
            )));
        }
        for (index, part) in self.partition_key.iter().enumerate() {
            match filter.get(part) {
                Some(Restriction::Eq(_)) => {}
                Some(Restriction::In(_)) => {
                    if index + 1 != self.partition_key.len() {
                        return Err(Error::invalid(format!(
                            "IN restriction is only allowed on the last partition key part, not \"{part}\""
                        )));
                    }
                }
                Some(Restriction::Cmp(_)) => {
                    return Err(Error::invalid(format!(
                        "Cannot use a range restriction on partition key part \"{part}\""
                    )));
                }
                None => unreachable!("missing parts rejected above"),
            }
        }

        // clustering columns must form a contiguous restricted prefix
        let restricted = |name: &String| {
            filter.get(name).is_some()
                || filter.iter().any(|(key, _)| match key {
                    ColumnRef::Tuple(names) => names.contains(name),
                    ColumnRef::Name(_) => false,
                })
        };
        let mut gap: Vec<&str> = Vec::new();
        for column in &self.clustering_key {
            if restricted(column) {
                if !gap.is_empty() {
                    return Err(Error::invalid(format!(
                        "Missing clustering key part(s) {}",
                        quoted(gap.into_iter())
                    )));
                }
            } else {
                gap.push(column);
            }
        }

        // everything else in the filter must reference key columns
        for (key, _) in filter.iter() {
            let names: Vec<&String> = match key {
                ColumnRef::Name(name) => vec![name],
                ColumnRef::Tuple(names) => names.iter().collect(),
            };
            for name in names {
                if !self.partition_key.contains(name) && !self.clustering_key.contains(name) {
                    return Err(Error::invalid(format!(
                        "Cannot filter by non-primary-key column \"{name}\""
                    )));
                }
            }
        }
        Ok(())
    }

    /// The partition-key tuples a filter selects. An empty filter means a
    /// full scan across every live partition; a trailing IN expands into one
    /// tuple per listed value.
    fn partition_keys(&self, filter: &Filter) -> Result<Vec<Vec<Value>>> {
        if filter.is_empty() {
            return Ok(self.partitions.read().keys().cloned().collect());
        }
        let mut prefix: Vec<Value> = Vec::new();
        let mut keys: Vec<Vec<Value>> = Vec::new();
        for (index, part) in self.partition_key.iter().enumerate() {
            match filter.get(part) {
                Some(Restriction::Eq(term)) => prefix.push(self.stored_value(part, term)?),
                Some(Restriction::In(terms)) if index + 1 == self.partition_key.len() => {
                    for term in terms {
                        let mut key = prefix.clone();
                        key.push(self.stored_value(part, term)?);
                        keys.push(key);
                    }
                    return Ok(keys);
                }
                _ => {
                    return Err(Error::invalid(format!(
                        "Missing partition key part(s) \"{part}\""
                    )))
                }
            }
        }
        keys.push(prefix);
        Ok(keys)
    }

    /// Filter entries not consumed by partition resolution; these are
    /// evaluated per record.
    fn residual_entries<'a>(&self, filter: &'a Filter) -> Vec<&'a (ColumnRef, Restriction)> {
        filter
            .iter()
            .filter(|(key, _)| match key {
                ColumnRef::Name(name) => !self.partition_key.contains(name),
                ColumnRef::Tuple(_) => true,
            })
            .collect()
    }

    fn matching_rows(&self, filter: &Filter) -> Result<Vec<Row>> {
        let residual = self.residual_entries(filter);
        ensure_bound(&residual)?;
        let mut rows = Vec::new();
        for key in self.partition_keys(filter)? {
            let Some(partition) = self.existing_partition(&key) else {
                continue;
            };
            let records = partition.records.lock();
            for row in records.values() {
                let mut matched = true;
                for entry in &residual {
                    if !row_matches(entry, row)? {
                        matched = false;
                        break;
                    }
                }
                if matched {
                    rows.push(row.clone());
                }
            }
        }
        Ok(rows)
    }

    /// Sort by the full primary key in declared order, flipping the
    /// direction of any column `order` marks descending.
    fn sort_rows(&self, rows: &mut [Row], order: &[(String, SortOrder)]) {
        let descending = |name: &str| {
            order
                .iter()
                .any(|(column, dir)| column == name && *dir == SortOrder::Desc)
        };
        rows.sort_by(|a, b| {
            for column in self.partition_key.iter().chain(self.clustering_key.iter()) {
                let left = a.get(column.as_str()).unwrap_or(&Value::Null);
                let right = b.get(column.as_str()).unwrap_or(&Value::Null);
                let mut ordering = left.cmp(right);
                if descending(column) {
                    ordering = ordering.reverse();
                }
                if ordering != std::cmp::Ordering::Equal {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
    }
}

/// Surface an unbound-parameter error before any record is inspected, so
/// a pending marker fails the same way whether or not the scan visits a
/// partition.
fn ensure_bound(entries: &[&(ColumnRef, Restriction)]) -> Result<()> {
    for (_, restriction) in entries {
        match restriction {
            Restriction::Eq(term) => {
                term.value()?;
            }
            Restriction::In(terms) => {
                for term in terms {
                    term.value()?;
                }
            }
            Restriction::Cmp(comparators) => {
                for comparator in comparators {
                    for term in &comparator.values {
                        term.value()?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Evaluate one filter entry against a stored row.
fn row_matches(entry: &(ColumnRef, Restriction), row: &Row) -> Result<bool> {
    let (key, restriction) = entry;
    match restriction {
        Restriction::Eq(term) => {
            let ColumnRef::Name(name) = key else {
                return Ok(false);
            };
            let stored = row.get(name.as_str()).unwrap_or(&Value::Null);
            Ok(stored.compare(term.value()?) == Some(Ordering::Equal))
        }
        Restriction::In(terms) => {
            let ColumnRef::Name(name) = key else {
                return Ok(false);
            };
            let stored = row.get(name.as_str()).unwrap_or(&Value::Null);
            for term in terms {
                if stored.compare(term.value()?) == Some(Ordering::Equal) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Restriction::Cmp(comparators) => {
            Ok(comparators.iter().all(|c| c.check_against(row)))
        }
    }
}

fn quoted<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names
        .map(|n| format!("\"{n}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Consume a filter's equality values as a seed row, used by the update
/// routing layer when no stored row matches.
pub(crate) fn seed_row(filter: &Filter) -> Result<Row> {
    let mut row = Row::new();
    for (key, restriction) in filter.iter() {
        if let (ColumnRef::Name(name), Restriction::Eq(term)) = (key, restriction) {
            row.insert(name.clone(), term.value()?.clone());
        }
    }
    Ok(row)
}
