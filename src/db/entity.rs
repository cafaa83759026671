//! Entity contract and binder.
//!
//! A record type describes its table through [`Entity`]: the table name, the key
//! column, the ordered column list and a `values` accessor returning one value
//! per column. The descriptor is fixed at compile time, usually generated by
//! [`impl_entity!`](crate::impl_entity).

use crate::error::{DbError, DbResult};
use crate::models::{Row, Value};
use chrono::NaiveDateTime;
use std::sync::Arc;

/// A record type that maps onto one table.
///
/// `KEY` must name one of `COLUMNS`, and `values` must return exactly one value
/// per column in `COLUMNS` order. Violations surface as [`DbError::Binding`]
/// before any SQL is issued.
pub trait Entity: Send + Sync {
    const TABLE: &'static str;
    const KEY: &'static str;
    const COLUMNS: &'static [&'static str];

    fn values(&self) -> Vec<Value>;

    /// Type name used in binding diagnostics.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<T: Entity + ?Sized> Entity for &T {
    const TABLE: &'static str = T::TABLE;
    const KEY: &'static str = T::KEY;
    const COLUMNS: &'static [&'static str] = T::COLUMNS;

    fn values(&self) -> Vec<Value> {
        (**self).values()
    }

    fn type_name() -> &'static str {
        T::type_name()
    }
}

impl<T: Entity + ?Sized> Entity for Box<T> {
    const TABLE: &'static str = T::TABLE;
    const KEY: &'static str = T::KEY;
    const COLUMNS: &'static [&'static str] = T::COLUMNS;

    fn values(&self) -> Vec<Value> {
        (**self).values()
    }

    fn type_name() -> &'static str {
        T::type_name()
    }
}

impl<T: Entity + ?Sized> Entity for Arc<T> {
    const TABLE: &'static str = T::TABLE;
    const KEY: &'static str = T::KEY;
    const COLUMNS: &'static [&'static str] = T::COLUMNS;

    fn values(&self) -> Vec<Value> {
        (**self).values()
    }

    fn type_name() -> &'static str {
        T::type_name()
    }
}

/// Decoding of a result row into a typed record.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> DbResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> DbResult<Self> {
        Ok(row.clone())
    }
}

// Single-column reads such as `SELECT COUNT(*) ...`
macro_rules! from_row_scalar {
    ($($t:ty),+) => {
        $(
            impl FromRow for $t {
                fn from_row(row: &Row) -> DbResult<Self> {
                    row.get_idx(0)
                }
            }
        )+
    };
}

from_row_scalar!(i64, i32, u64, f64, bool, String, Vec<u8>, NaiveDateTime);

/// Parallel column names and values for one entity instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub names: Vec<&'static str>,
    pub values: Vec<Value>,
    key_index: usize,
}

impl Binding {
    /// Position of the key column in `names`.
    pub fn key_index(&self) -> usize {
        self.key_index
    }

    pub fn key_value(&self) -> &Value {
        &self.values[self.key_index]
    }

    /// Split into the non-key columns and values plus the key value.
    pub fn split_key(mut self) -> (Vec<&'static str>, Vec<Value>, Value) {
        let key = self.values.remove(self.key_index);
        self.names.remove(self.key_index);
        (self.names, self.values, key)
    }
}

/// Bind every column of `entity`.
pub fn bind<E: Entity>(entity: &E) -> DbResult<Binding> {
    let values = entity.values();

    if values.len() != E::COLUMNS.len() {
        let missing = E::COLUMNS
            .get(values.len())
            .copied()
            .unwrap_or("<extra value>");
        return Err(DbError::binding(missing, E::type_name()));
    }

    let key_index = E::COLUMNS
        .iter()
        .position(|c| *c == E::KEY)
        .ok_or_else(|| DbError::binding(E::KEY, E::type_name()))?;

    Ok(Binding {
        names: E::COLUMNS.to_vec(),
        values,
        key_index,
    })
}

/// Bind the requested columns of `entity`, in the requested order.
pub fn bind_names<E: Entity>(entity: &E, names: &[&str]) -> DbResult<Vec<Value>> {
    let binding = bind(entity)?;
    names
        .iter()
        .map(|name| {
            binding
                .names
                .iter()
                .position(|c| c == name)
                .map(|idx| binding.values[idx].clone())
                .ok_or_else(|| DbError::binding(*name, E::type_name()))
        })
        .collect()
}
