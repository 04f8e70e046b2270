//! Cast compiler: emits the dialect-specific SQL expression that renders a
//! column into its canonical text form before hashing.
//!
//! Fingerprint equality across engines requires byte-identical text for
//! semantically equal values, so these expressions pin the byte forms:
//! NULL becomes the empty string, numerics are fixed-point with trailing
//! zeros trimmed, booleans are `true`/`false`, timestamps are ISO 8601
//! normalized to UTC, binaries are lowercase hex.

use super::{
    carries_zone, classify, fractional_precision, is_float, CastNotation, HashMethod, TypeClass,
};
use crate::dialect::Platform;

/// Threshold above which `notation` mode switches to scientific text.
const NOTATION_THRESHOLD: &str = "1e15";

/// Largest decimal precision rendered through the integer fast path.
const MAX_INTEGER_PRECISION: i32 = 18;

/// Type names that are integral by definition, independent of the catalog
/// precision (which some engines report in bits).
const INTEGER_TYPES: &[&str] = &[
    "bigint", "bigserial", "int", "integer", "int2", "int4", "int8", "serial", "smallint",
    "smallserial", "tinyint",
];

/// Options governing the cast compiler, taken from the run configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct CastOptions {
    pub method: HashMethod,
    pub number_cast: CastNotation,
    pub float_cast: CastNotation,
}

/// Compile the canonical value expression for a column.
///
/// `column` must already be quoted per the column's preserve-case flag.
/// Unsupported types still get an expression (the raw cast) so a persisted
/// map row is never empty, but the mapping compiler excludes them from
/// hashing.
pub fn cast_expr(
    platform: Platform,
    column: &str,
    data_type: &str,
    data_precision: i32,
    data_scale: i32,
    opts: &CastOptions,
) -> String {
    if opts.method == HashMethod::Raw {
        return cast_raw_expr(platform, column);
    }

    match classify(data_type) {
        TypeClass::Boolean => boolean_expr(platform, column),
        TypeClass::Numeric if is_float(data_type) => {
            float_expr(platform, column, opts.float_cast)
        }
        TypeClass::Numeric => numeric_expr(
            platform,
            column,
            data_type,
            data_precision,
            data_scale,
            opts.number_cast,
        ),
        TypeClass::Timestamp => timestamp_expr(platform, column, data_type, data_scale),
        TypeClass::Binary => binary_expr(platform, column),
        TypeClass::String => string_expr(platform, column),
        TypeClass::Unsupported => cast_raw_expr(platform, column),
    }
}

/// Raw mode: the dialect's safest text cast with NULL -> empty string.
pub fn cast_raw_expr(platform: Platform, column: &str) -> String {
    match platform {
        Platform::Postgres => format!("COALESCE(CAST({} AS TEXT), '')", column),
        Platform::Oracle => format!("NVL(TO_CHAR({}), '')", column),
        Platform::Mysql | Platform::Mariadb => format!("COALESCE(CAST({} AS CHAR), '')", column),
        Platform::Mssql => format!("ISNULL(CAST({} AS NVARCHAR(MAX)), '')", column),
        Platform::Db2 => format!("COALESCE(VARCHAR({}), '')", column),
    }
}

fn null_default(platform: Platform, expr: &str) -> String {
    match platform {
        Platform::Oracle => format!("NVL({}, '')", expr),
        Platform::Mssql => format!("ISNULL({}, '')", expr),
        _ => format!("COALESCE({}, '')", expr),
    }
}

fn boolean_expr(platform: Platform, column: &str) -> String {
    match platform {
        Platform::Mysql | Platform::Mariadb => format!(
            "CASE WHEN {col} IS NULL THEN '' WHEN {col} <> 0 THEN 'true' ELSE 'false' END",
            col = column
        ),
        _ => format!(
            "CASE WHEN {col} IS NULL THEN '' WHEN {col} THEN 'true' ELSE 'false' END",
            col = column
        ),
    }
}

/// Fixed-point text with trailing zeros (and a bare trailing separator)
/// trimmed: 100.00 -> "100", 50.50 -> "50.5", -0.25 -> "-0.25".
fn decimal_text(platform: Platform, column: &str, frac_digits: i32) -> String {
    let frac = frac_digits.clamp(1, 20) as usize;
    match platform {
        Platform::Postgres => format!(
            "RTRIM(TO_CHAR({}, 'FM{}0.{}'), '.')",
            column,
            "9".repeat(32),
            "9".repeat(frac)
        ),
        Platform::Oracle => format!(
            "RTRIM(TO_CHAR({}, 'FM{}0.{}'), '.')",
            column,
            "9".repeat(32),
            "9".repeat(frac)
        ),
        Platform::Mysql | Platform::Mariadb => format!(
            "TRIM(TRAILING '.' FROM TRIM(TRAILING '0' FROM CAST({} AS CHAR)))",
            column
        ),
        Platform::Mssql => format!("FORMAT({}, '0.{}')", column, "#".repeat(frac)),
        Platform::Db2 => format!(
            "RTRIM(VARCHAR_FORMAT({}, 'FM{}0.{}'), '.')",
            column,
            "9".repeat(31),
            "9".repeat(frac)
        ),
    }
}

/// Scientific text used by `notation` mode above the magnitude threshold.
fn scientific_text(platform: Platform, column: &str) -> String {
    match platform {
        Platform::Postgres | Platform::Oracle => {
            format!("TO_CHAR({}, 'FM9.99999999999999EEEE')", column)
        }
        Platform::Mysql | Platform::Mariadb => {
            format!("CAST(CAST({} AS DOUBLE) AS CHAR)", column)
        }
        Platform::Mssql => format!("FORMAT({}, '0.##############E+0')", column),
        Platform::Db2 => format!("VARCHAR_FORMAT({}, 'FM9.99999999999999EEEE')", column),
    }
}

fn with_notation(platform: Platform, column: &str, standard: String, notation: CastNotation) -> String {
    match notation {
        CastNotation::Standard => null_default(platform, &standard),
        CastNotation::Notation => {
            let scientific = scientific_text(platform, column);
            null_default(
                platform,
                &format!(
                    "CASE WHEN ABS({col}) >= {threshold} THEN {sci} ELSE {std} END",
                    col = column,
                    threshold = NOTATION_THRESHOLD,
                    sci = scientific,
                    std = standard
                ),
            )
        }
    }
}

fn integer_text(platform: Platform, column: &str) -> String {
    match platform {
        Platform::Postgres => format!("CAST(CAST({} AS BIGINT) AS TEXT)", column),
        Platform::Oracle => format!("TO_CHAR({}, 'FM{}0')", column, "9".repeat(18)),
        Platform::Mysql | Platform::Mariadb => {
            format!("CAST(CAST({} AS SIGNED) AS CHAR)", column)
        }
        Platform::Mssql => format!("CAST(CAST({} AS BIGINT) AS VARCHAR(20))", column),
        Platform::Db2 => format!("CAST(CAST({} AS BIGINT) AS VARCHAR(20))", column),
    }
}

fn numeric_expr(
    platform: Platform,
    column: &str,
    data_type: &str,
    data_precision: i32,
    data_scale: i32,
    notation: CastNotation,
) -> String {
    // Integral types and scale-zero decimals within bigint range take the
    // integer fast path; everything else renders as trimmed fixed-point
    // text.
    let integral = INTEGER_TYPES.contains(&data_type.to_lowercase().as_str())
        || (data_scale == 0 && data_precision > 0 && data_precision <= MAX_INTEGER_PRECISION);
    if integral {
        return null_default(platform, &integer_text(platform, column));
    }
    let frac = if data_scale > 0 { data_scale } else { 18 };
    let standard = decimal_text(platform, column, frac);
    with_notation(platform, column, standard, notation)
}

fn float_expr(platform: Platform, column: &str, notation: CastNotation) -> String {
    let standard = decimal_text(platform, column, 17);
    with_notation(platform, column, standard, notation)
}

fn string_expr(platform: Platform, column: &str) -> String {
    match platform {
        Platform::Postgres => null_default(platform, &format!("CAST({} AS TEXT)", column)),
        Platform::Oracle => null_default(platform, &format!("TO_CHAR({})", column)),
        Platform::Mysql | Platform::Mariadb => {
            null_default(platform, &format!("CAST({} AS CHAR)", column))
        }
        Platform::Mssql => null_default(platform, &format!("CAST({} AS NVARCHAR(MAX))", column)),
        Platform::Db2 => null_default(platform, &format!("CAST({} AS VARCHAR(32672))", column)),
    }
}

fn binary_expr(platform: Platform, column: &str) -> String {
    match platform {
        Platform::Postgres => null_default(platform, &format!("ENCODE({}, 'hex')", column)),
        Platform::Oracle => null_default(platform, &format!("LOWER(RAWTOHEX({}))", column)),
        Platform::Mysql | Platform::Mariadb => {
            null_default(platform, &format!("LOWER(HEX({}))", column))
        }
        Platform::Mssql => null_default(
            platform,
            &format!("LOWER(CONVERT(VARCHAR(MAX), {}, 2))", column),
        ),
        Platform::Db2 => null_default(platform, &format!("LOWER(HEX({}))", column)),
    }
}

/// UTC-normalized base expression for a datetime column. Zone-carrying
/// types are shifted to UTC; zoneless values are taken as already UTC so
/// mixed zoned/zoneless pairs produce aligned text.
fn utc_base(platform: Platform, column: &str, data_type: &str) -> String {
    if !carries_zone(data_type) {
        return column.to_string();
    }
    match platform {
        Platform::Postgres => format!("({} AT TIME ZONE 'UTC')", column),
        Platform::Oracle => format!("SYS_EXTRACT_UTC({})", column),
        Platform::Mssql => format!("SWITCHOFFSET({}, '+00:00')", column),
        // MySQL TIMESTAMP renders in the session zone; the driver pins the
        // session to +00:00 at connect. DB2 has no zoned datetime type.
        _ => column.to_string(),
    }
}

/// Trim trailing fractional zeros, then a bare trailing separator.
/// Only applied to text that is known to end with a fractional part.
fn trim_fraction(platform: Platform, expr: &str) -> String {
    match platform {
        Platform::Mysql | Platform::Mariadb => format!(
            "TRIM(TRAILING '.' FROM TRIM(TRAILING '0' FROM {}))",
            expr
        ),
        _ => format!("RTRIM(RTRIM({}, '0'), '.')", expr),
    }
}

fn datetime_text(platform: Platform, base: &str, frac: i32) -> String {
    match platform {
        Platform::Postgres | Platform::Oracle => {
            if frac > 0 {
                trim_fraction(
                    platform,
                    &format!(
                        "TO_CHAR({}, 'YYYY-MM-DD\"T\"HH24:MI:SS.FF{}')",
                        base, frac
                    ),
                )
            } else {
                format!("TO_CHAR({}, 'YYYY-MM-DD\"T\"HH24:MI:SS')", base)
            }
        }
        Platform::Mysql | Platform::Mariadb => {
            let seconds = format!("DATE_FORMAT({}, '%Y-%m-%dT%H:%i:%S')", base);
            if frac > 0 {
                let fraction = trim_fraction(
                    platform,
                    &format!(
                        "CONCAT('.', LEFT(DATE_FORMAT({}, '%f'), {}))",
                        base,
                        frac.min(6)
                    ),
                );
                format!("CONCAT({}, {})", seconds, fraction)
            } else {
                seconds
            }
        }
        Platform::Mssql => {
            if frac > 0 {
                format!(
                    "FORMAT({}, 'yyyy-MM-ddTHH:mm:ss.{}')",
                    base,
                    "F".repeat(frac.min(7) as usize)
                )
            } else {
                format!("FORMAT({}, 'yyyy-MM-ddTHH:mm:ss')", base)
            }
        }
        Platform::Db2 => {
            if frac > 0 {
                trim_fraction(
                    platform,
                    &format!(
                        "VARCHAR_FORMAT({}, 'YYYY-MM-DD\"T\"HH24:MI:SS.FF{}')",
                        base, frac
                    ),
                )
            } else {
                format!("VARCHAR_FORMAT({}, 'YYYY-MM-DD\"T\"HH24:MI:SS')", base)
            }
        }
    }
}

fn date_only_text(platform: Platform, column: &str) -> String {
    match platform {
        Platform::Postgres => format!("TO_CHAR({}, 'YYYY-MM-DD')", column),
        // Oracle DATE carries a time component and is handled as a full
        // datetime before this function is reached.
        Platform::Oracle => format!("TO_CHAR({}, 'YYYY-MM-DD')", column),
        Platform::Mysql | Platform::Mariadb => {
            format!("DATE_FORMAT({}, '%Y-%m-%d')", column)
        }
        Platform::Mssql => format!("CONVERT(VARCHAR(10), {}, 23)", column),
        Platform::Db2 => format!("VARCHAR_FORMAT({}, 'YYYY-MM-DD')", column),
    }
}

fn time_only_text(platform: Platform, column: &str) -> String {
    match platform {
        Platform::Postgres => format!("TO_CHAR({}, 'HH24:MI:SS')", column),
        Platform::Oracle => format!("TO_CHAR({}, 'HH24:MI:SS')", column),
        Platform::Mysql | Platform::Mariadb => {
            format!("TIME_FORMAT({}, '%H:%i:%S')", column)
        }
        Platform::Mssql => format!("CONVERT(VARCHAR(8), {}, 108)", column),
        Platform::Db2 => format!("VARCHAR_FORMAT({}, 'HH24:MI:SS')", column),
    }
}

fn timestamp_expr(platform: Platform, column: &str, data_type: &str, data_scale: i32) -> String {
    let base_name = data_type.to_lowercase();

    // Date-only, time-only, and year types carry no zone suffix.
    if base_name == "date" && platform != Platform::Oracle {
        return null_default(platform, &date_only_text(platform, column));
    }
    if base_name == "time" {
        return null_default(platform, &time_only_text(platform, column));
    }
    if base_name == "year" {
        return null_default(platform, &format!("CAST({} AS CHAR)", column));
    }

    // Full timestamps: UTC-normalized ISO 8601 with an explicit offset.
    let frac = fractional_precision(data_type, data_scale);
    let base = utc_base(platform, column, data_type);
    let text = datetime_text(platform, &base, frac);
    let suffixed = match platform {
        Platform::Oracle | Platform::Db2 => format!("{} || '+00:00'", text),
        _ => format!("CONCAT({}, '+00:00')", text),
    };
    // Some engines' CONCAT swallows NULL arguments, which would render a
    // NULL timestamp as a bare offset; guard the whole expression instead.
    format!(
        "CASE WHEN {} IS NULL THEN '' ELSE {} END",
        column, suffixed
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> CastOptions {
        CastOptions::default()
    }

    #[test]
    fn raw_mode_ignores_type() {
        let o = CastOptions {
            method: HashMethod::Raw,
            ..Default::default()
        };
        let expr = cast_expr(Platform::Postgres, "salary", "numeric", 10, 2, &o);
        assert_eq!(expr, "COALESCE(CAST(salary AS TEXT), '')");
    }

    #[test]
    fn integer_fast_path() {
        let expr = cast_expr(Platform::Postgres, "id", "numeric", 6, 0, &opts());
        assert_eq!(expr, "COALESCE(CAST(CAST(id AS BIGINT) AS TEXT), '')");
        let ora = cast_expr(Platform::Oracle, "ID", "number", 6, 0, &opts());
        assert!(ora.starts_with("NVL(TO_CHAR(ID, 'FM"));
    }

    #[test]
    fn decimal_trims_trailing_zeros() {
        let expr = cast_expr(Platform::Postgres, "salary", "numeric", 10, 2, &opts());
        assert!(expr.contains("RTRIM"));
        assert!(expr.contains("FM"));
        assert!(expr.contains(".99"));
        let my = cast_expr(Platform::Mysql, "salary", "decimal", 10, 2, &opts());
        assert!(my.contains("TRIM(TRAILING '0'"));
    }

    #[test]
    fn notation_mode_switches_on_magnitude() {
        let expr = cast_expr(Platform::Postgres, "big", "numeric", 38, 4, &opts());
        assert!(expr.contains("CASE WHEN ABS(big) >= 1e15"));
        assert!(expr.contains("EEEE"));

        let standard = CastOptions {
            number_cast: CastNotation::Standard,
            ..Default::default()
        };
        let expr = cast_expr(Platform::Postgres, "big", "numeric", 38, 4, &standard);
        assert!(!expr.contains("CASE WHEN"));
    }

    #[test]
    fn float_uses_float_cast_option() {
        let standard = CastOptions {
            float_cast: CastNotation::Standard,
            ..Default::default()
        };
        let expr = cast_expr(Platform::Postgres, "ratio", "float8", 0, 0, &standard);
        assert!(!expr.contains("CASE WHEN"));
        let expr = cast_expr(Platform::Postgres, "ratio", "float8", 0, 0, &opts());
        assert!(expr.contains("CASE WHEN ABS(ratio) >= 1e15"));
    }

    #[test]
    fn boolean_true_false_empty() {
        let expr = cast_expr(Platform::Postgres, "active", "boolean", 0, 0, &opts());
        assert_eq!(
            expr,
            "CASE WHEN active IS NULL THEN '' WHEN active THEN 'true' ELSE 'false' END"
        );
        let my = cast_expr(Platform::Mysql, "active", "bool", 0, 0, &opts());
        assert!(my.contains("<> 0"));
    }

    #[test]
    fn string_null_becomes_empty() {
        assert_eq!(
            cast_expr(Platform::Postgres, "name", "varchar", 20, 0, &opts()),
            "COALESCE(CAST(name AS TEXT), '')"
        );
        assert_eq!(
            cast_expr(Platform::Oracle, "NAME", "varchar2", 20, 0, &opts()),
            "NVL(TO_CHAR(NAME), '')"
        );
        assert_eq!(
            cast_expr(Platform::Mssql, "name", "nvarchar", 20, 0, &opts()),
            "ISNULL(CAST(name AS NVARCHAR(MAX)), '')"
        );
    }

    #[test]
    fn binary_lowercase_hex() {
        assert_eq!(
            cast_expr(Platform::Postgres, "payload", "bytea", 0, 0, &opts()),
            "COALESCE(ENCODE(payload, 'hex'), '')"
        );
        assert!(cast_expr(Platform::Oracle, "PAYLOAD", "raw", 0, 0, &opts()).contains("RAWTOHEX"));
        assert!(cast_expr(Platform::Mysql, "payload", "blob", 0, 0, &opts()).contains("HEX("));
    }

    #[test]
    fn zoned_timestamp_normalizes_to_utc() {
        let expr = cast_expr(Platform::Postgres, "ts", "timestamptz", 0, 0, &opts());
        assert!(expr.contains("AT TIME ZONE 'UTC'"));
        assert!(expr.contains("'+00:00'"));

        let ora = cast_expr(
            Platform::Oracle,
            "TS",
            "timestamp(0) with time zone",
            0,
            0,
            &opts(),
        );
        assert!(ora.contains("SYS_EXTRACT_UTC"));

        let ms = cast_expr(Platform::Mssql, "ts", "datetimeoffset", 0, 7, &opts());
        assert!(ms.contains("SWITCHOFFSET"));
    }

    #[test]
    fn zoneless_timestamp_still_gets_offset_suffix() {
        // Zoneless values are assumed UTC so zoned/zoneless pairs align.
        let expr = cast_expr(Platform::Mssql, "ts", "datetime2", 0, 0, &opts());
        assert!(expr.contains("'+00:00'"));
        assert!(!expr.contains("SWITCHOFFSET"));
    }

    #[test]
    fn fractional_seconds_only_when_declared() {
        let no_frac = cast_expr(Platform::Postgres, "ts", "timestamp", 0, 0, &opts());
        assert!(!no_frac.contains(".FF"));
        let frac = cast_expr(Platform::Postgres, "ts", "timestamp", 0, 3, &opts());
        assert!(frac.contains(".FF3"));
        assert!(frac.contains("RTRIM"));
    }

    #[test]
    fn date_and_time_forms() {
        let d = cast_expr(Platform::Postgres, "d", "date", 0, 0, &opts());
        assert!(d.contains("'YYYY-MM-DD'"));
        assert!(!d.contains("+00:00"));
        let t = cast_expr(Platform::Mysql, "t", "time", 0, 0, &opts());
        assert!(t.contains("TIME_FORMAT"));
        // Oracle DATE carries time and renders as a full datetime.
        let ora = cast_expr(Platform::Oracle, "D", "date", 0, 0, &opts());
        assert!(ora.contains("HH24:MI:SS"));
        assert!(ora.contains("+00:00"));
    }

    #[test]
    fn unsupported_gets_raw_cast() {
        let expr = cast_expr(Platform::Mssql, "rv", "rowversion", 0, 0, &opts());
        assert_eq!(expr, "ISNULL(CAST(rv AS NVARCHAR(MAX)), '')");
    }
}
