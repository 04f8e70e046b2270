//! Configuration loading and validation.

mod types;
mod validation;

pub use types::{Config, DbConfig, RawConfig};

use crate::error::Result;
use std::path::Path;

/// Characters that force a properties value to be quoted when rewritten
/// into `key: value` form for the serde pass.
const YAML_SPECIALS: &[char] = &[
    ':', '#', '{', '}', '[', ']', ',', '&', '*', '?', '|', '<', '>', '=', '!', '%', '@', '\'',
    '"', '\\',
];

/// Rewrite classic `key=value` properties lines into `key: value` mapping
/// lines. Lines already in mapping form pass through untouched, so both
/// file styles load through the same serde path.
fn properties_to_mapping(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
            continue;
        }
        let eq = trimmed.find('=');
        let colon = trimmed.find(':');
        let (key, value) = match (eq, colon) {
            (Some(e), Some(c)) if e < c => (&trimmed[..e], trimmed[e + 1..].trim()),
            (Some(e), None) => (&trimmed[..e], trimmed[e + 1..].trim()),
            _ => {
                out.push_str(trimmed);
                out.push('\n');
                continue;
            }
        };
        let needs_quotes = value.is_empty()
            || value.contains(YAML_SPECIALS)
            || value.starts_with(' ')
            || value.ends_with(' ');
        if needs_quotes {
            let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
            out.push_str(&format!("{}: \"{}\"\n", key.trim(), escaped));
        } else {
            out.push_str(&format!("{}: {}\n", key.trim(), value));
        }
    }
    out
}

impl Config {
    /// Load configuration from a properties file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Parse configuration from properties or mapping text.
    pub fn from_str(content: &str) -> Result<Self> {
        let mapping = properties_to_mapping(content);
        let raw: RawConfig = serde_yaml::from_str(&mapping)?;
        raw.into_config()
    }

    /// Validate the configuration. `require_endpoints` is false only for
    /// the `init` action, which touches the repository alone.
    pub fn validate(&self, require_endpoints: bool) -> Result<()> {
        validation::validate(self, require_endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::{CastNotation, HashMethod};
    use crate::dialect::Platform;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_PROPERTIES: &str = r#"
# repository
repo-host=localhost
repo-dbname=pgcompare
repo-user=pgcompare
repo-password=secret

source-type=oracle
source-host=ora01
source-dbname=ORCL
source-user=app
source-password=secret

target-type=postgres
target-host=pg01
target-dbname=appdb
target-user=app
target-password=secret

batch-fetch-size=5000
loader-threads=4
number-cast=standard
"#;

    #[test]
    fn parses_properties_lines() {
        let config = Config::from_str(VALID_PROPERTIES).unwrap();
        assert_eq!(config.repo.host, "localhost");
        assert_eq!(config.source.platform, Platform::Oracle);
        assert_eq!(config.source.port, 1521); // platform default
        assert_eq!(config.target.platform, Platform::Postgres);
        assert_eq!(config.batch_fetch_size, 5000);
        assert_eq!(config.loader_threads, 4);
        assert_eq!(config.number_cast, CastNotation::Standard);
        assert_eq!(config.float_cast, CastNotation::Notation); // default
        assert_eq!(config.column_hash_method, HashMethod::Normalized);
        config.validate(true).unwrap();
    }

    #[test]
    fn parses_mapping_lines() {
        let config = Config::from_str(
            "repo-host: localhost\nrepo-dbname: pgcompare\nrepo-user: pgcompare\n",
        )
        .unwrap();
        assert_eq!(config.repo.dbname, "pgcompare");
        config.validate(false).unwrap();
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::with_suffix(".properties").unwrap();
        file.write_all(VALID_PROPERTIES.as_bytes()).unwrap();
        file.flush().unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.repo.dbname, "pgcompare");
    }

    #[test]
    fn quoted_password_with_specials() {
        let config = Config::from_str(
            "repo-host=localhost\nrepo-dbname=d\nrepo-user=u\nrepo-password=p@ss:w#rd\n",
        )
        .unwrap();
        assert_eq!(config.repo.password, "p@ss:w#rd");
    }

    #[test]
    fn unknown_dialect_is_config_error() {
        let result = Config::from_str(
            "repo-host=h\nrepo-dbname=d\nrepo-user=u\nsource-type=sybase\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let result = Config::from_str("repo-host=h\nbatch-fetch-sizes=10\n");
        assert!(result.is_err());
    }

    #[test]
    fn missing_repo_host_fails_validation() {
        let config = Config::from_str("repo-dbname=d\nrepo-user=u\n").unwrap();
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn endpoints_required_only_when_asked() {
        let config =
            Config::from_str("repo-host=h\nrepo-dbname=d\nrepo-user=u\n").unwrap();
        config.validate(false).unwrap();
        assert!(config.validate(true).is_err());
    }

    #[test]
    fn invalid_sslmode_rejected() {
        let config = Config::from_str(
            "repo-host=h\nrepo-dbname=d\nrepo-user=u\nrepo-sslmode=verify-full\n",
        )
        .unwrap();
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let config = Config::from_str(
            "repo-host=h\nrepo-dbname=d\nrepo-user=u\nrepo-password=topsecret\n",
        )
        .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("topsecret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
