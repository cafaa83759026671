//! Connection-related data models.
//!
//! This module defines the supported database types and the bind-marker dialect
//! each of them speaks.

use serde::{Deserialize, Serialize};

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Value of the `db.system` span attribute.
    pub fn system_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgresql",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        }
    }

    /// Bind-marker dialect spoken by this database.
    pub fn dialect(&self) -> Dialect {
        match self {
            Self::PostgreSQL => Dialect::Dollar,
            Self::MySQL | Self::SQLite => Dialect::Question,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Placeholder syntax understood by a driver.
///
/// Statements are always synthesized with generic `?` markers and rebound
/// right before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `?` (MySQL, SQLite)
    Question,
    /// `$1`, `$2`, ... (PostgreSQL)
    Dollar,
}

impl Dialect {
    /// Convert generic `?` placeholders into this dialect's bind markers.
    ///
    /// Question marks inside single- or double-quoted literals are left alone.
    pub fn rebind(&self, sql: &str) -> String {
        if *self == Dialect::Question {
            return sql.to_string();
        }

        let mut out = String::with_capacity(sql.len() + 8);
        let mut n = 0usize;
        let mut quote: Option<char> = None;

        for c in sql.chars() {
            match quote {
                Some(q) => {
                    if c == q {
                        quote = None;
                    }
                    out.push(c);
                }
                None => match c {
                    '\'' | '"' => {
                        quote = Some(c);
                        out.push(c);
                    }
                    '?' => {
                        n += 1;
                        out.push('$');
                        out.push_str(&n.to_string());
                    }
                    _ => out.push(c),
                },
            }
        }
        out
    }

    /// True when the driver cannot report a generated key after INSERT and the
    /// statement must carry a `RETURNING` clause instead.
    pub fn needs_returning(&self) -> bool {
        *self == Dialect::Dollar
    }
}
