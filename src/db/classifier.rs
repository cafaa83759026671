//! Best-effort SQL shape classification for metric labels.
//!
//! Extracts the primary table and the command keyword from a statement. This is
//! not a parser: CTEs, subqueries and multi-statement strings yield whatever the
//! first matching alternative captures, and unrecognized SQL yields empty labels.

use once_cell::sync::Lazy;
use regex::Regex;

/// Alternatives are tried in keyword-priority order: select, update, delete, insert.
static SQL_SHAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?is)",
        r"(?P<sel_cmd>select)\s+.+?from\s+(?P<sel_table>\w+)",
        r"|(?P<upd_cmd>update)\s+(?P<upd_table>\w+)",
        r"|(?P<del_cmd>delete)\s+from\s+(?P<del_table>\w+)",
        r"|(?P<ins_cmd>insert)\s+into\s+(?P<ins_table>\w+)",
    ))
    .unwrap()
});

const GROUPS: &[(&str, &str)] = &[
    ("sel_cmd", "sel_table"),
    ("upd_cmd", "upd_table"),
    ("del_cmd", "del_table"),
    ("ins_cmd", "ins_table"),
];

/// `(table, command)` pair, both lower-cased. Empty when unrecognized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlShape {
    pub table: String,
    pub command: String,
}

impl SqlShape {
    pub fn is_empty(&self) -> bool {
        self.table.is_empty() && self.command.is_empty()
    }
}

/// Classify a statement into its table and command.
pub fn classify(sql: &str) -> SqlShape {
    let Some(caps) = SQL_SHAPE_RE.captures(sql) else {
        return SqlShape::default();
    };

    for (cmd_group, table_group) in GROUPS {
        if let (Some(cmd), Some(table)) = (caps.name(cmd_group), caps.name(table_group)) {
            return SqlShape {
                table: table.as_str().to_lowercase(),
                command: cmd.as_str().to_lowercase(),
            };
        }
    }

    SqlShape::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(sql: &str) -> (String, String) {
        let s = classify(sql);
        (s.table, s.command)
    }

    #[test]
    fn test_select() {
        assert_eq!(
            shape("SELECT * FROM t_demo WHERE id = ?"),
            ("t_demo".into(), "select".into())
        );
    }

    #[test]
    fn test_update() {
        assert_eq!(
            shape("UPDATE t_admin SET phone=?"),
            ("t_admin".into(), "update".into())
        );
    }

    #[test]
    fn test_delete_and_insert() {
        assert_eq!(
            shape("delete from T_Admin where id = ?"),
            ("t_admin".into(), "delete".into())
        );
        assert_eq!(
            shape("INSERT INTO t_admin(username,password) VALUES (?,?)"),
            ("t_admin".into(), "insert".into())
        );
    }

    #[test]
    fn test_select_spanning_lines() {
        assert_eq!(
            shape("SELECT id,\n  name\nFROM users\nWHERE id = $1"),
            ("users".into(), "select".into())
        );
    }

    #[test]
    fn test_garbage_yields_empty() {
        assert!(classify("garbage;;;").is_empty());
        assert!(classify("").is_empty());
        assert!(classify("SELECT 1").is_empty());
    }

    #[test]
    fn test_leftmost_keyword_wins() {
        assert_eq!(
            shape("INSERT INTO archive SELECT * FROM live"),
            ("archive".into(), "insert".into())
        );
    }
}
