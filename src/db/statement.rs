//! Statement synthesis from entities.
//!
//! Builds INSERT / UPDATE / DELETE / SELECT-by-key statements from an
//! [`Entity`] binding. SQL is assembled with generic `?` markers and then
//! rebound for the target [`Dialect`].

use crate::db::entity::{Entity, bind};
use crate::error::{DbError, DbResult};
use crate::models::{Dialect, Value};

/// SQL text with its ordered arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub args: Vec<Value>,
    /// Columns the arguments were bound from, in argument order.
    pub columns: Vec<&'static str>,
}

fn marks(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// `INSERT INTO <table>(<cols>) VALUES (<marks>)`.
///
/// The key column is always dropped, whatever its value; the database assigns
/// it. On dialects that cannot report the generated key, `RETURNING <key>` is
/// appended.
pub fn insert<E: Entity>(entity: &E, dialect: Dialect) -> DbResult<BoundStatement> {
    let (names, args, _) = bind(entity)?.split_key();
    if names.is_empty() {
        return Err(DbError::binding(E::KEY, E::type_name()));
    }

    let mut sql = format!(
        "INSERT INTO {}({}) VALUES ({})",
        E::TABLE,
        names.join(","),
        marks(names.len())
    );
    if dialect.needs_returning() {
        sql.push_str(" RETURNING ");
        sql.push_str(E::KEY);
    }

    Ok(BoundStatement {
        sql: dialect.rebind(&sql),
        args,
        columns: names,
    })
}

/// `UPDATE <table> SET c1=?,c2=? WHERE <key> = ?`.
///
/// Full-row replace: every non-key column is written. The key value is the
/// last argument.
pub fn update<E: Entity>(entity: &E, dialect: Dialect) -> DbResult<BoundStatement> {
    let (mut names, mut args, key) = bind(entity)?.split_key();
    if names.is_empty() {
        return Err(DbError::binding(E::KEY, E::type_name()));
    }

    let set = names
        .iter()
        .map(|n| format!("{}=?", n))
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!("UPDATE {} SET {} WHERE {} = ?", E::TABLE, set, E::KEY);

    names.push(E::KEY);
    args.push(key);

    Ok(BoundStatement {
        sql: dialect.rebind(&sql),
        args,
        columns: names,
    })
}

/// `DELETE FROM <table> WHERE <key> = ?` bound to the key value only.
pub fn delete<E: Entity>(entity: &E, dialect: Dialect) -> DbResult<BoundStatement> {
    let binding = bind(entity)?;
    let sql = format!("DELETE FROM {} WHERE {} = ?", E::TABLE, E::KEY);

    Ok(BoundStatement {
        sql: dialect.rebind(&sql),
        args: vec![binding.key_value().clone()],
        columns: vec![E::KEY],
    })
}

/// `SELECT <cols> FROM <table> WHERE <key> = ?`.
pub fn find<E: Entity>(key: impl Into<Value>, dialect: Dialect) -> DbResult<BoundStatement> {
    if !E::COLUMNS.contains(&E::KEY) {
        return Err(DbError::binding(E::KEY, E::type_name()));
    }

    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?",
        E::COLUMNS.join(","),
        E::TABLE,
        E::KEY
    );

    Ok(BoundStatement {
        sql: dialect.rebind(&sql),
        args: vec![key.into()],
        columns: vec![E::KEY],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[derive(Clone)]
    struct Profile {
        id: i64,
        username: String,
        password: String,
        phone: String,
        role_type: i32,
        ctime: chrono::NaiveDateTime,
        mtime: chrono::NaiveDateTime,
    }

    crate::impl_entity!(Profile, table = "t_admin", key = "id", columns = [
        id, username, password, phone, role_type, ctime, mtime,
    ]);

    struct KeyOnly {
        id: i64,
    }

    crate::impl_entity!(KeyOnly, table = "t_key", key = "id", columns = [id]);

    fn profile(id: i64) -> Profile {
        let t = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        Profile {
            id,
            username: "admin".into(),
            password: "secret".into(),
            phone: "13800000000".into(),
            role_type: 1,
            ctime: t,
            mtime: t,
        }
    }

    #[test]
    fn test_insert_drops_key_even_when_set() {
        let stmt = insert(&profile(42), Dialect::Question).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO t_admin(username,password,phone,role_type,ctime,mtime) VALUES (?,?,?,?,?,?)"
        );
        assert_eq!(stmt.args.len(), 6);
        assert!(!stmt.columns.contains(&"id"));
        assert!(!stmt.args.contains(&Value::Int(42)));
    }

    #[test]
    fn test_insert_dollar_returns_key() {
        let stmt = insert(&profile(0), Dialect::Dollar).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO t_admin(username,password,phone,role_type,ctime,mtime) VALUES ($1,$2,$3,$4,$5,$6) RETURNING id"
        );
    }

    #[test]
    fn test_update_key_last() {
        let stmt = update(&profile(5), Dialect::Question).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE t_admin SET username=?,password=?,phone=?,role_type=?,ctime=?,mtime=? WHERE id = ?"
        );
        assert_eq!(stmt.args.len(), 7);
        assert_eq!(stmt.args.last(), Some(&Value::Int(5)));
        assert_eq!(stmt.columns.last(), Some(&"id"));
    }

    #[test]
    fn test_update_dollar() {
        let stmt = update(&profile(5), Dialect::Dollar).unwrap();
        assert!(stmt.sql.ends_with("mtime=$6 WHERE id = $7"));
    }

    #[test]
    fn test_delete_binds_key_only() {
        let stmt = delete(&profile(9), Dialect::Question).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM t_admin WHERE id = ?");
        assert_eq!(stmt.args, vec![Value::Int(9)]);
    }

    #[test]
    fn test_find_selects_all_columns() {
        let stmt = find::<Profile>(3i64, Dialect::Dollar).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT id,username,password,phone,role_type,ctime,mtime FROM t_admin WHERE id = $1"
        );
        assert_eq!(stmt.args, vec![Value::Int(3)]);
    }

    #[test]
    fn test_key_only_entity_cannot_insert_or_update() {
        let k = KeyOnly { id: 1 };
        assert!(matches!(
            insert(&k, Dialect::Question),
            Err(DbError::Binding { .. })
        ));
        assert!(matches!(
            update(&k, Dialect::Question),
            Err(DbError::Binding { .. })
        ));
        assert!(delete(&k, Dialect::Question).is_ok());
    }
}
