//! Dialect adapter: per-engine SQL syntax, identifier quoting, case folding,
//! and the hash-expression templates used by the column-map compiler.
//!
//! Every engine-specific string in the crate is produced here or in
//! [`catalog`], so the rest of the engine stays dialect-agnostic.

mod catalog;

pub use catalog::{select_columns_sql, select_tables_sql};

use crate::error::{CompareError, Result};
use crate::model::DataClass;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported database platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Postgres,
    Oracle,
    Mysql,
    Mariadb,
    Mssql,
    Db2,
}

/// Native identifier case of an engine's catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeCase {
    Upper,
    Lower,
}

/// Reserved words that force quoting during discovery regardless of case.
const RESERVED_WORDS: &[&str] = &[
    "add", "all", "alter", "and", "any", "as", "asc", "at", "authid", "between", "by",
    "character", "check", "cluster", "column", "comment", "connect", "constraint", "continue",
    "create", "cross", "current", "current_user", "cursor", "database", "date", "default",
    "delete", "desc", "distinct", "double", "else", "end", "except", "exception", "exists",
    "external", "fetch", "for", "from", "grant", "group", "having", "identified", "if", "in",
    "index", "insert", "integer", "intersect", "into", "is", "join", "like", "lock", "long",
    "loop", "modify", "natural", "no", "not", "null", "on", "open", "option", "or", "order",
    "outer", "package", "prior", "privileges", "procedure", "public", "rename", "replace",
    "rowid", "rownum", "schema", "select", "session", "set", "sql", "start", "statement",
    "sys", "table", "then", "to", "trigger", "union", "unique", "update", "user", "values",
    "varchar", "varchar2", "view", "when", "where", "with", "xor",
];

impl Platform {
    /// Parse a platform name from configuration.
    pub fn parse(name: &str) -> Result<Platform> {
        match name.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Platform::Postgres),
            "oracle" => Ok(Platform::Oracle),
            "mysql" => Ok(Platform::Mysql),
            "mariadb" => Ok(Platform::Mariadb),
            "mssql" | "sqlserver" => Ok(Platform::Mssql),
            "db2" => Ok(Platform::Db2),
            other => Err(CompareError::config(format!(
                "Unknown database type '{}'. Valid options: postgres, oracle, mysql, mariadb, mssql, db2",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Postgres => "postgres",
            Platform::Oracle => "oracle",
            Platform::Mysql => "mysql",
            Platform::Mariadb => "mariadb",
            Platform::Mssql => "mssql",
            Platform::Db2 => "db2",
        }
    }

    /// Native case an unquoted identifier folds to in this engine's catalog.
    pub fn native_case(&self) -> NativeCase {
        match self {
            Platform::Oracle | Platform::Db2 => NativeCase::Upper,
            _ => NativeCase::Lower,
        }
    }

    /// Whether an identifier needs `preserve_case` to survive a round trip
    /// through this engine unquoted: mixed case relative to the native
    /// folding, a reserved word, or a non-identifier character.
    pub fn needs_preserve_case(&self, name: &str) -> bool {
        let folded = match self.native_case() {
            NativeCase::Upper => name.to_uppercase(),
            NativeCase::Lower => name.to_lowercase(),
        };
        if folded != name {
            return true;
        }
        if RESERVED_WORDS.contains(&name.to_lowercase().as_str()) {
            return true;
        }
        !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    }

    /// Quote an identifier. With `preserve_case` the identifier is wrapped
    /// in the engine's quote characters (escaping embedded quotes);
    /// otherwise it is rendered in the engine's native case, unquoted.
    pub fn quote(&self, name: &str, preserve_case: bool) -> String {
        if !preserve_case {
            return match self.native_case() {
                NativeCase::Upper => name.to_uppercase(),
                NativeCase::Lower => name.to_lowercase(),
            };
        }
        match self {
            Platform::Mysql | Platform::Mariadb => format!("`{}`", name.replace('`', "``")),
            Platform::Mssql => format!("[{}]", name.replace(']', "]]")),
            _ => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Qualified `schema.table` per the two preserve-case flags.
    pub fn qualify(&self, schema: &str, table: &str, schema_pc: bool, table_pc: bool) -> String {
        format!("{}.{}", self.quote(schema, schema_pc), self.quote(table, table_pc))
    }

    /// Positional bind placeholder for the n-th parameter (1-based).
    pub fn bind_placeholder(&self, n: usize) -> String {
        match self {
            Platform::Postgres => format!("${}", n),
            Platform::Oracle => format!(":{}", n),
            Platform::Mssql => format!("@P{}", n),
            _ => "?".to_string(),
        }
    }

    /// String-concatenate already NULL-safe text expressions.
    pub fn concat(&self, parts: &[String]) -> String {
        if parts.is_empty() {
            return "''".to_string();
        }
        if parts.len() == 1 {
            return parts[0].clone();
        }
        match self {
            Platform::Oracle | Platform::Db2 => parts.join(" || "),
            Platform::Mssql => format!("CONCAT({})", parts.join(", ")),
            _ => format!("CONCAT_WS('', {})", parts.join(", ")),
        }
    }

    /// Wrap a text expression into the engine's 32-hex lowercase MD5 form.
    pub fn md5(&self, expr: &str) -> String {
        match self {
            Platform::Postgres => format!("MD5({})", expr),
            Platform::Oracle => format!("LOWER(STANDARD_HASH({}, 'MD5'))", expr),
            Platform::Mysql | Platform::Mariadb => format!("LOWER(MD5({}))", expr),
            Platform::Mssql => {
                format!("LOWER(CONVERT(VARCHAR(32), HASHBYTES('MD5', {}), 2))", expr)
            }
            Platform::Db2 => format!("LOWER(HEX(HASH_MD5({})))", expr),
        }
    }

    /// MD5 over the concatenation of NULL-safe value expressions.
    pub fn hash_expr(&self, value_exprs: &[String]) -> String {
        self.md5(&self.concat(value_exprs))
    }

    /// A single-quoted SQL string literal.
    pub fn string_literal(&self, text: &str) -> String {
        format!("'{}'", text.replace('\'', "''"))
    }

    /// Build the JSON object literal projected as the `pk` column:
    /// `{"alias": "value", …}` with values taken from the canonical text
    /// expressions.
    pub fn pk_json_expr(&self, pairs: &[(String, String)]) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(pairs.len() * 3 + 2);
        for (i, (alias, value_expr)) in pairs.iter().enumerate() {
            let prefix = if i == 0 {
                format!("{{\"{}\": \"", alias)
            } else {
                format!(", \"{}\": \"", alias)
            };
            parts.push(self.string_literal(&prefix));
            parts.push(value_expr.clone());
        }
        parts.push(self.string_literal("\"}"));
        self.concat(&parts)
    }

    /// Shard membership predicate: `mod(hash_or_mod(col), shards) = shard`.
    ///
    /// Numeric mod columns use plain MOD on the value; other classes run
    /// through the engine's deterministic hash-to-integer function.
    pub fn shard_predicate(
        &self,
        column: &str,
        data_class: DataClass,
        shards: i32,
        shard: i32,
    ) -> String {
        let bucket = match data_class {
            DataClass::Numeric => match self {
                Platform::Mssql => format!("ABS({}) % {}", column, shards),
                _ => format!("MOD(ABS({}), {})", column, shards),
            },
            _ => match self {
                Platform::Postgres => {
                    format!("MOD(ABS(HASHTEXT(CAST({} AS TEXT))), {})", column, shards)
                }
                Platform::Oracle => format!("MOD(ORA_HASH({}), {})", column, shards),
                Platform::Mysql | Platform::Mariadb => {
                    format!("MOD(CRC32({}), {})", column, shards)
                }
                Platform::Mssql => format!("ABS(CHECKSUM({})) % {}", column, shards),
                Platform::Db2 => format!("MOD(ABS(HASH4({})), {})", column, shards),
            },
        };
        format!("{} = {}", bucket, shard)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_platforms() {
        assert_eq!(Platform::parse("postgres").unwrap(), Platform::Postgres);
        assert_eq!(Platform::parse("ORACLE").unwrap(), Platform::Oracle);
        assert_eq!(Platform::parse("sqlserver").unwrap(), Platform::Mssql);
        assert!(Platform::parse("sybase").is_err());
    }

    #[test]
    fn quote_folds_native_case_when_not_preserved() {
        assert_eq!(Platform::Postgres.quote("EmpName", false), "empname");
        assert_eq!(Platform::Oracle.quote("EmpName", false), "EMPNAME");
    }

    #[test]
    fn quote_preserves_and_escapes() {
        assert_eq!(Platform::Postgres.quote("Emp\"Name", true), "\"Emp\"\"Name\"");
        assert_eq!(Platform::Mysql.quote("emp`name", true), "`emp``name`");
        assert_eq!(Platform::Mssql.quote("emp]name", true), "[emp]]name]");
    }

    #[test]
    fn preserve_case_detection() {
        assert!(Platform::Postgres.needs_preserve_case("EmpName"));
        assert!(!Platform::Postgres.needs_preserve_case("empname"));
        assert!(Platform::Postgres.needs_preserve_case("order")); // reserved
        assert!(Platform::Oracle.needs_preserve_case("empname")); // lower vs upper native
        assert!(!Platform::Oracle.needs_preserve_case("EMPNAME"));
    }

    #[test]
    fn hash_expr_per_dialect() {
        let parts = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            Platform::Postgres.hash_expr(&parts),
            "MD5(CONCAT_WS('', a, b))"
        );
        assert_eq!(
            Platform::Oracle.hash_expr(&parts),
            "LOWER(STANDARD_HASH(a || b, 'MD5'))"
        );
        assert!(Platform::Mssql.hash_expr(&parts).contains("HASHBYTES"));
        assert!(Platform::Db2.hash_expr(&parts).contains("HASH_MD5"));
    }

    #[test]
    fn pk_json_shape() {
        let pairs = vec![("id".to_string(), "v_id".to_string())];
        let expr = Platform::Postgres.pk_json_expr(&pairs);
        assert!(expr.contains("'{\"id\": \"'"));
        assert!(expr.contains("v_id"));
        assert!(expr.contains("'\"}'"));
    }

    #[test]
    fn shard_predicate_numeric_vs_char() {
        let numeric = Platform::Postgres.shard_predicate("id", DataClass::Numeric, 4, 1);
        assert_eq!(numeric, "MOD(ABS(id), 4) = 1");
        let text = Platform::Postgres.shard_predicate("name", DataClass::Char, 4, 1);
        assert!(text.contains("HASHTEXT"));
        let ora = Platform::Oracle.shard_predicate("name", DataClass::Char, 4, 0);
        assert!(ora.contains("ORA_HASH"));
    }

    #[test]
    fn bind_placeholders() {
        assert_eq!(Platform::Postgres.bind_placeholder(2), "$2");
        assert_eq!(Platform::Oracle.bind_placeholder(1), ":1");
        assert_eq!(Platform::Mssql.bind_placeholder(3), "@P3");
        assert_eq!(Platform::Mysql.bind_placeholder(1), "?");
    }
}
