//! Catalog metadata queries, one fixed SELECT per engine.
//!
//! Every query returns the same projection so the discovery path can treat
//! all engines uniformly:
//! `owner, table_name, column_name, data_type, data_length, data_precision,
//!  data_scale, nullable ('Y'/'N'), pk ('Y'/'N')`.
//!
//! Column queries take two binds (schema, table); table queries take one
//! (schema), in the platform's placeholder style.

use super::Platform;

const POSTGRES_COLUMNS: &str = r#"
SELECT c.table_schema AS owner,
       c.table_name AS table_name,
       c.column_name AS column_name,
       c.udt_name AS data_type,
       COALESCE(c.character_maximum_length, 0)::int4 AS data_length,
       COALESCE(c.numeric_precision, 0)::int4 AS data_precision,
       COALESCE(c.numeric_scale, 0)::int4 AS data_scale,
       CASE WHEN c.is_nullable = 'YES' THEN 'Y' ELSE 'N' END AS nullable,
       CASE WHEN pk.column_name IS NULL THEN 'N' ELSE 'Y' END AS pk
FROM information_schema.columns c
LEFT JOIN (
    SELECT kcu.table_schema, kcu.table_name, kcu.column_name
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON kcu.constraint_name = tc.constraint_name
     AND kcu.table_schema = tc.table_schema
     AND kcu.table_name = tc.table_name
    WHERE tc.constraint_type = 'PRIMARY KEY'
) pk ON pk.table_schema = c.table_schema
    AND pk.table_name = c.table_name
    AND pk.column_name = c.column_name
WHERE c.table_schema = $1
  AND c.table_name = $2
ORDER BY c.column_name
"#;

const POSTGRES_TABLES: &str = r#"
SELECT table_schema AS owner, table_name AS table_name
FROM information_schema.tables
WHERE table_schema = $1
  AND table_type = 'BASE TABLE'
ORDER BY table_name
"#;

const ORACLE_COLUMNS: &str = r#"
SELECT c.owner AS owner,
       c.table_name AS table_name,
       c.column_name AS column_name,
       LOWER(c.data_type) AS data_type,
       NVL(c.data_length, 0) AS data_length,
       NVL(c.data_precision, 0) AS data_precision,
       NVL(c.data_scale, 0) AS data_scale,
       c.nullable AS nullable,
       NVL2(pk.column_name, 'Y', 'N') AS pk
FROM all_tab_columns c
LEFT JOIN (
    SELECT acc.owner, acc.table_name, acc.column_name
    FROM all_constraints ac
    JOIN all_cons_columns acc
      ON acc.owner = ac.owner
     AND acc.constraint_name = ac.constraint_name
    WHERE ac.constraint_type = 'P'
) pk ON pk.owner = c.owner
    AND pk.table_name = c.table_name
    AND pk.column_name = c.column_name
WHERE c.owner = UPPER(:1)
  AND c.table_name = UPPER(:2)
ORDER BY c.column_name
"#;

const ORACLE_TABLES: &str = r#"
SELECT owner AS owner, table_name AS table_name
FROM all_tables
WHERE owner = UPPER(:1)
ORDER BY table_name
"#;

const MYSQL_COLUMNS: &str = r#"
SELECT c.table_schema AS owner,
       c.table_name AS table_name,
       c.column_name AS column_name,
       c.data_type AS data_type,
       COALESCE(c.character_maximum_length, 0) AS data_length,
       COALESCE(c.numeric_precision, 0) AS data_precision,
       COALESCE(c.numeric_scale, 0) AS data_scale,
       CASE WHEN c.is_nullable = 'YES' THEN 'Y' ELSE 'N' END AS nullable,
       CASE WHEN c.column_key = 'PRI' THEN 'Y' ELSE 'N' END AS pk
FROM information_schema.columns c
WHERE c.table_schema = ?
  AND c.table_name = ?
ORDER BY c.column_name
"#;

const MYSQL_TABLES: &str = r#"
SELECT table_schema AS owner, table_name AS table_name
FROM information_schema.tables
WHERE table_schema = ?
  AND table_type = 'BASE TABLE'
ORDER BY table_name
"#;

const MSSQL_COLUMNS: &str = r#"
SELECT c.TABLE_SCHEMA AS owner,
       c.TABLE_NAME AS table_name,
       c.COLUMN_NAME AS column_name,
       LOWER(c.DATA_TYPE) AS data_type,
       COALESCE(c.CHARACTER_MAXIMUM_LENGTH, 0) AS data_length,
       COALESCE(c.NUMERIC_PRECISION, 0) AS data_precision,
       COALESCE(c.NUMERIC_SCALE, 0) AS data_scale,
       CASE WHEN c.IS_NULLABLE = 'YES' THEN 'Y' ELSE 'N' END AS nullable,
       CASE WHEN pk.COLUMN_NAME IS NULL THEN 'N' ELSE 'Y' END AS pk
FROM INFORMATION_SCHEMA.COLUMNS c
LEFT JOIN (
    SELECT kcu.TABLE_SCHEMA, kcu.TABLE_NAME, kcu.COLUMN_NAME
    FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
    JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
      ON kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
     AND kcu.TABLE_SCHEMA = tc.TABLE_SCHEMA
     AND kcu.TABLE_NAME = tc.TABLE_NAME
    WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
) pk ON pk.TABLE_SCHEMA = c.TABLE_SCHEMA
    AND pk.TABLE_NAME = c.TABLE_NAME
    AND pk.COLUMN_NAME = c.COLUMN_NAME
WHERE c.TABLE_SCHEMA = @P1
  AND c.TABLE_NAME = @P2
ORDER BY c.COLUMN_NAME
"#;

const MSSQL_TABLES: &str = r#"
SELECT TABLE_SCHEMA AS owner, TABLE_NAME AS table_name
FROM INFORMATION_SCHEMA.TABLES
WHERE TABLE_SCHEMA = @P1
  AND TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_NAME
"#;

const DB2_COLUMNS: &str = r#"
SELECT c.tabschema AS owner,
       c.tabname AS table_name,
       c.colname AS column_name,
       LOWER(c.typename) AS data_type,
       COALESCE(c.length, 0) AS data_length,
       COALESCE(c.length, 0) AS data_precision,
       COALESCE(c.scale, 0) AS data_scale,
       CASE WHEN c.nulls = 'Y' THEN 'Y' ELSE 'N' END AS nullable,
       CASE WHEN c.keyseq IS NULL OR c.keyseq = 0 THEN 'N' ELSE 'Y' END AS pk
FROM syscat.columns c
WHERE c.tabschema = UPPER(?)
  AND c.tabname = UPPER(?)
ORDER BY c.colname
"#;

const DB2_TABLES: &str = r#"
SELECT tabschema AS owner, tabname AS table_name
FROM syscat.tables
WHERE tabschema = UPPER(?)
  AND type = 'T'
ORDER BY tabname
"#;

/// Column metadata query for a platform (binds: schema, table).
pub fn select_columns_sql(platform: Platform) -> &'static str {
    match platform {
        Platform::Postgres => POSTGRES_COLUMNS,
        Platform::Oracle => ORACLE_COLUMNS,
        Platform::Mysql | Platform::Mariadb => MYSQL_COLUMNS,
        Platform::Mssql => MSSQL_COLUMNS,
        Platform::Db2 => DB2_COLUMNS,
    }
}

/// Table listing query for a platform (bind: schema).
pub fn select_tables_sql(platform: Platform) -> &'static str {
    match platform {
        Platform::Postgres => POSTGRES_TABLES,
        Platform::Oracle => ORACLE_TABLES,
        Platform::Mysql | Platform::Mariadb => MYSQL_TABLES,
        Platform::Mssql => MSSQL_TABLES,
        Platform::Db2 => DB2_TABLES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_platform_has_catalog_sql() {
        for p in [
            Platform::Postgres,
            Platform::Oracle,
            Platform::Mysql,
            Platform::Mariadb,
            Platform::Mssql,
            Platform::Db2,
        ] {
            let cols = select_columns_sql(p);
            for alias in [
                "owner",
                "table_name",
                "column_name",
                "data_type",
                "data_length",
                "data_precision",
                "data_scale",
                "nullable",
                "pk",
            ] {
                assert!(cols.to_lowercase().contains(alias), "{} missing {}", p, alias);
            }
            assert!(select_tables_sql(p).to_lowercase().contains("table_name"));
        }
    }

    #[test]
    fn binds_match_platform_style() {
        assert!(select_columns_sql(Platform::Postgres).contains("$2"));
        assert!(select_columns_sql(Platform::Oracle).contains(":2"));
        assert!(select_columns_sql(Platform::Mssql).contains("@P2"));
        assert!(select_columns_sql(Platform::Mysql).contains('?'));
    }
}
