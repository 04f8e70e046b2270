//! Repository schema DDL, executed by the `init` action.
//!
//! The dc_* layout is stable; statements are idempotent so `init` can be
//! re-run against an existing repository.

pub const CREATE_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS dc_project (
        pid INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
        project_name TEXT NOT NULL DEFAULT 'default',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"INSERT INTO dc_project (pid, project_name)
       VALUES (1, 'default')
       ON CONFLICT (pid) DO NOTHING"#,
    r#"CREATE TABLE IF NOT EXISTS dc_table (
        tid INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
        pid INTEGER NOT NULL REFERENCES dc_project(pid),
        alias TEXT NOT NULL,
        enabled BOOLEAN NOT NULL DEFAULT TRUE,
        batch_nbr INTEGER NOT NULL DEFAULT 1,
        parallel_degree INTEGER NOT NULL DEFAULT 1,
        UNIQUE (pid, alias)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS dc_table_map (
        tid INTEGER NOT NULL REFERENCES dc_table(tid) ON DELETE CASCADE,
        dest_type TEXT NOT NULL CHECK (dest_type IN ('source', 'target')),
        schema_name TEXT NOT NULL,
        table_name TEXT NOT NULL,
        mod_column TEXT,
        table_filter TEXT,
        schema_preserve_case BOOLEAN NOT NULL DEFAULT FALSE,
        table_preserve_case BOOLEAN NOT NULL DEFAULT FALSE,
        PRIMARY KEY (tid, dest_type)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS dc_table_column_map (
        tid INTEGER NOT NULL REFERENCES dc_table(tid) ON DELETE CASCADE,
        column_alias TEXT NOT NULL,
        dest_type TEXT NOT NULL CHECK (dest_type IN ('source', 'target')),
        column_name TEXT NOT NULL,
        data_type TEXT NOT NULL,
        data_length INTEGER NOT NULL DEFAULT 0,
        data_precision INTEGER NOT NULL DEFAULT 0,
        data_scale INTEGER NOT NULL DEFAULT 0,
        nullable BOOLEAN NOT NULL DEFAULT TRUE,
        pk BOOLEAN NOT NULL DEFAULT FALSE,
        data_class TEXT NOT NULL DEFAULT 'char',
        preserve_case BOOLEAN NOT NULL DEFAULT FALSE,
        value_expression TEXT NOT NULL DEFAULT '',
        supported BOOLEAN NOT NULL DEFAULT TRUE,
        PRIMARY KEY (tid, dest_type, column_alias)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS dc_source (
        tid INTEGER NOT NULL,
        batch_nbr INTEGER NOT NULL DEFAULT 1,
        pk_hash VARCHAR(100) NOT NULL,
        column_hash VARCHAR(100) NOT NULL,
        pk JSONB
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_dc_source_hash
        ON dc_source (tid, batch_nbr, pk_hash)"#,
    r#"CREATE TABLE IF NOT EXISTS dc_target (
        tid INTEGER NOT NULL,
        batch_nbr INTEGER NOT NULL DEFAULT 1,
        pk_hash VARCHAR(100) NOT NULL,
        column_hash VARCHAR(100) NOT NULL,
        pk JSONB
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_dc_target_hash
        ON dc_target (tid, batch_nbr, pk_hash)"#,
    r#"CREATE TABLE IF NOT EXISTS dc_source_findings (
        tid INTEGER NOT NULL,
        batch_nbr INTEGER NOT NULL DEFAULT 1,
        pk JSONB,
        status TEXT NOT NULL CHECK (status IN ('missing', 'not_equal')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS dc_target_findings (
        tid INTEGER NOT NULL,
        batch_nbr INTEGER NOT NULL DEFAULT 1,
        pk JSONB,
        status TEXT NOT NULL CHECK (status IN ('missing', 'not_equal')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS dc_table_history (
        tid INTEGER NOT NULL,
        action TEXT NOT NULL,
        batch_nbr INTEGER NOT NULL DEFAULT 1,
        start_ts TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        end_ts TIMESTAMPTZ,
        result JSONB
    )"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_covers_the_stable_layout() {
        let all = CREATE_STATEMENTS.join("\n");
        for table in [
            "dc_project",
            "dc_table",
            "dc_table_map",
            "dc_table_column_map",
            "dc_source",
            "dc_target",
            "dc_source_findings",
            "dc_target_findings",
            "dc_table_history",
        ] {
            assert!(all.contains(table), "missing {}", table);
        }
    }

    #[test]
    fn ddl_is_idempotent() {
        for stmt in CREATE_STATEMENTS {
            let upper = stmt.to_uppercase();
            assert!(
                upper.contains("IF NOT EXISTS") || upper.contains("ON CONFLICT"),
                "statement not idempotent: {}",
                stmt
            );
        }
    }
}
