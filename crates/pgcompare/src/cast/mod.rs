//! Type classification for the cast compiler.
//!
//! Declared type names (lowercased) are classified into coarse sets that
//! drive both the canonical cast expression and the `data_class` persisted
//! in the column map. Timestamps, strings, and binaries collapse into the
//! `char` data class once their canonical text form is fixed.

mod compiler;

pub use compiler::{cast_expr, cast_raw_expr, CastOptions};

use crate::model::DataClass;
use serde::{Deserialize, Serialize};

/// Coarse classification of a declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Boolean,
    String,
    Numeric,
    Timestamp,
    Binary,
    Unsupported,
}

/// How a column is rendered into hash input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMethod {
    /// Dialect's safest text cast, NULL becomes the empty string.
    Raw,
    /// Full canonical normalization (default).
    Normalized,
}

impl Default for HashMethod {
    fn default() -> Self {
        HashMethod::Normalized
    }
}

/// Rendering of very large magnitudes for numeric and float casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CastNotation {
    /// Scientific form for |x| >= 1e+15 to avoid dialect width clipping.
    Notation,
    /// Plain fixed-point text everywhere.
    Standard,
}

impl Default for CastNotation {
    fn default() -> Self {
        CastNotation::Notation
    }
}

const BOOLEAN_TYPES: &[&str] = &["bool", "boolean"];

const STRING_TYPES: &[&str] = &[
    "bpchar", "char", "character", "clob", "enum", "json", "jsonb", "nchar", "nclob", "ntext",
    "nvarchar", "nvarchar2", "text", "varchar", "varchar2", "xml",
];

const NUMERIC_TYPES: &[&str] = &[
    "bigint", "bigserial", "binary_double", "binary_float", "dec", "decimal", "double",
    "double precision", "fixed", "float", "float4", "float8", "int", "integer", "int2", "int4",
    "int8", "money", "number", "numeric", "real", "serial", "smallint", "smallmoney",
    "smallserial", "tinyint",
];

const TIMESTAMP_TYPES: &[&str] = &[
    "date", "datetime", "datetimeoffset", "datetime2", "smalldatetime", "time", "timestamp",
    "timestamptz", "year",
];

const BINARY_TYPES: &[&str] = &["bytea", "binary", "blob", "raw", "varbinary"];

const UNSUPPORTED_TYPES: &[&str] = &[
    "bfile", "bit", "cursor", "hierarchyid", "image", "rowid", "rowversion", "set",
    "sql_variant", "uniqueidentifier", "long", "long raw",
];

/// Floating-point subset of the numeric class, governed by `float-cast`
/// rather than `number-cast`.
const FLOAT_TYPES: &[&str] = &[
    "binary_double", "binary_float", "double", "double precision", "float", "float4", "float8",
    "real",
];

/// Normalize a declared type name: lowercase, strip trailing precision
/// suffixes like `timestamp(6)` or `timestamp(3) with time zone`.
fn base_type(data_type: &str) -> String {
    let lower = data_type.trim().to_lowercase();
    if let Some(open) = lower.find('(') {
        if let Some(close) = lower[open..].find(')') {
            let mut base = lower[..open].trim_end().to_string();
            let rest = lower[open + close + 1..].trim();
            if !rest.is_empty() {
                base.push(' ');
                base.push_str(rest);
            }
            return base;
        }
    }
    lower
}

/// Classify a declared type name.
pub fn classify(data_type: &str) -> TypeClass {
    let base = base_type(data_type);
    let name = base.as_str();

    if UNSUPPORTED_TYPES.contains(&name) {
        return TypeClass::Unsupported;
    }
    if BOOLEAN_TYPES.contains(&name) {
        return TypeClass::Boolean;
    }
    if NUMERIC_TYPES.contains(&name) {
        return TypeClass::Numeric;
    }
    if name.starts_with("timestamp") || TIMESTAMP_TYPES.contains(&name) {
        return TypeClass::Timestamp;
    }
    if BINARY_TYPES.contains(&name) {
        return TypeClass::Binary;
    }
    if STRING_TYPES.contains(&name) {
        return TypeClass::String;
    }
    // Anything unrecognized is treated as text.
    TypeClass::String
}

/// Collapse a type class into the persisted `data_class`.
pub fn data_class(data_type: &str) -> DataClass {
    match classify(data_type) {
        TypeClass::Boolean => DataClass::Boolean,
        TypeClass::Numeric => DataClass::Numeric,
        _ => DataClass::Char,
    }
}

/// Whether the declared type is in the floating-point subset.
pub fn is_float(data_type: &str) -> bool {
    FLOAT_TYPES.contains(&base_type(data_type).as_str())
}

/// Whether the declared type carries a time zone.
pub fn carries_zone(data_type: &str) -> bool {
    let lower = data_type.to_lowercase();
    lower.contains("with time zone")
        || lower.starts_with("timestamptz")
        || lower.starts_with("datetimeoffset")
}

/// Fractional-second digits declared for a timestamp type: an explicit
/// `(N)` in the type name wins, otherwise the catalog scale.
pub fn fractional_precision(data_type: &str, data_scale: i32) -> i32 {
    let lower = data_type.to_lowercase();
    if let Some(open) = lower.find('(') {
        if let Some(close) = lower[open..].find(')') {
            if let Ok(p) = lower[open + 1..open + close].trim().parse::<i32>() {
                return p.clamp(0, 9);
            }
        }
    }
    data_scale.clamp(0, 9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_core_sets() {
        assert_eq!(classify("boolean"), TypeClass::Boolean);
        assert_eq!(classify("varchar2"), TypeClass::String);
        assert_eq!(classify("number"), TypeClass::Numeric);
        assert_eq!(classify("timestamptz"), TypeClass::Timestamp);
        assert_eq!(classify("bytea"), TypeClass::Binary);
        assert_eq!(classify("uniqueidentifier"), TypeClass::Unsupported);
        assert_eq!(classify("rowversion"), TypeClass::Unsupported);
    }

    #[test]
    fn classify_parameterized_timestamps() {
        assert_eq!(classify("timestamp(6)"), TypeClass::Timestamp);
        assert_eq!(classify("timestamp(3) with time zone"), TypeClass::Timestamp);
        assert_eq!(classify("TIMESTAMP(9) WITH TIME ZONE"), TypeClass::Timestamp);
    }

    #[test]
    fn unknown_types_fall_back_to_string() {
        assert_eq!(classify("citext"), TypeClass::String);
        assert_eq!(data_class("citext"), DataClass::Char);
    }

    #[test]
    fn data_class_collapses_to_char() {
        assert_eq!(data_class("timestamp"), DataClass::Char);
        assert_eq!(data_class("blob"), DataClass::Char);
        assert_eq!(data_class("text"), DataClass::Char);
        assert_eq!(data_class("numeric"), DataClass::Numeric);
        assert_eq!(data_class("bool"), DataClass::Boolean);
    }

    #[test]
    fn float_subset() {
        assert!(is_float("double precision"));
        assert!(is_float("binary_float"));
        assert!(!is_float("numeric"));
    }

    #[test]
    fn zone_detection() {
        assert!(carries_zone("timestamptz"));
        assert!(carries_zone("timestamp(6) with time zone"));
        assert!(carries_zone("datetimeoffset"));
        assert!(!carries_zone("timestamp"));
        assert!(!carries_zone("datetime2"));
    }

    #[test]
    fn fractional_precision_from_name_or_scale() {
        assert_eq!(fractional_precision("timestamp(3)", 6), 3);
        assert_eq!(fractional_precision("timestamp", 6), 6);
        assert_eq!(fractional_precision("datetime2", 0), 0);
    }
}
