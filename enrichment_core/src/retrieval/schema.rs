//! Game-system attribute schemas, looked up by system code.

use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::debug;

static SCHEMA_CODE_RE: OnceLock<Regex> = OnceLock::new();

fn schema_code_re() -> &'static Regex {
    SCHEMA_CODE_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9-]+$").expect("static regex is valid"))
}

/// Whether `code` is safe to use as a file stem: ASCII alphanumerics and
/// hyphens only, so no separators or `..`.
pub fn is_valid_schema_code(code: &str) -> bool {
    schema_code_re().is_match(code)
}

/// Source of schema text. Every failure yields an empty string.
#[async_trait]
pub trait SchemaLoader: Send + Sync {
    async fn load_schema(&self, code: &str) -> String;
}

/// Loader with no schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSchema;

#[async_trait]
impl SchemaLoader for NoSchema {
    async fn load_schema(&self, _code: &str) -> String {
        String::new()
    }
}

/// Reads `<dir>/<code>.<extension>` from disk.
#[derive(Debug, Clone)]
pub struct FsSchemaLoader {
    dir: PathBuf,
    extension: String,
}

impl FsSchemaLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: "yaml".to_string(),
        }
    }

    /// Override the file extension (default `yaml`).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    fn path_for(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", code, self.extension))
    }
}

#[async_trait]
impl SchemaLoader for FsSchemaLoader {
    async fn load_schema(&self, code: &str) -> String {
        if !is_valid_schema_code(code) {
            debug!(code, "rejecting invalid schema code");
            return String::new();
        }
        let path = self.path_for(code);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "schema not loaded");
                String::new()
            }
        }
    }
}
