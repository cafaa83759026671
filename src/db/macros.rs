//! Declarative macros for reducing code duplication.
//!
//! `impl_db_dispatch!` fans a call out over the `DbPool` variants and
//! `impl_entity!` generates the compile-time mapping descriptor for a record
//! type. Both expand at compile time with zero runtime overhead.

/// Macro for generating database dispatch match arms.
///
/// This macro generates match arms for `DbPool` variants, reducing the need
/// to manually write repetitive match statements.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(pool, {
///     MySql(p) => do_mysql(p),
///     Postgres(p) => do_postgres(p),
///     SQLite(p) => do_sqlite(p),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::driver::DbPool::$variant($p) => $body,
            )+
        }
    };
}

/// Implement [`Entity`](crate::db::Entity) and [`FromRow`](crate::db::FromRow)
/// for a plain struct.
///
/// Every listed field becomes a column, in the listed order. A field may be
/// mapped to a differently named column with `field as "column"`. Field types
/// must convert into [`Value`](crate::models::Value) and implement
/// [`FromValue`](crate::models::FromValue).
///
/// # Example
///
/// ```ignore
/// struct Profile { id: i64, username: String, role: i32 }
///
/// impl_entity!(Profile, table = "t_admin", key = "id", columns = [
///     id,
///     username,
///     role as "role_type",
/// ]);
/// ```
#[macro_export]
macro_rules! impl_entity {
    (@column $field:ident) => {
        stringify!($field)
    };
    (@column $field:ident, $col:literal) => {
        $col
    };
    (
        $ty:ty,
        table = $table:literal,
        key = $key:literal,
        columns = [ $($field:ident $(as $col:literal)?),+ $(,)? ] $(,)?
    ) => {
        impl $crate::db::entity::Entity for $ty {
            const TABLE: &'static str = $table;
            const KEY: &'static str = $key;
            const COLUMNS: &'static [&'static str] =
                &[$($crate::impl_entity!(@column $field $(, $col)?)),+];

            fn values(&self) -> ::std::vec::Vec<$crate::models::Value> {
                ::std::vec![$($crate::models::Value::from(::std::clone::Clone::clone(&self.$field))),+]
            }
        }

        impl $crate::db::entity::FromRow for $ty {
            fn from_row(row: &$crate::models::Row) -> $crate::error::DbResult<Self> {
                Ok(Self {
                    $($field: row.get($crate::impl_entity!(@column $field $(, $col)?))?,)+
                })
            }
        }
    };
}

pub use impl_db_dispatch;
pub use impl_entity;
