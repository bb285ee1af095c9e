//! The `quarry.toml` application manifest.

use std::path::{Path, PathBuf};

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::Deserialize;
use thiserror::Error;

/// Result type for manifest operations (boxed to reduce size on stack).
pub type Result<T> = std::result::Result<T, Box<Error>>;

/// Root schema for quarry.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Application metadata.
    pub app: AppConfig,
}

/// The `[app]` section of quarry.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Application name; also the name of the root package.
    pub name: String,

    /// Directive namespace recognized in source comments.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Base URL used for documentation links in diagnostic hints.
    #[serde(default = "default_docs_base_url")]
    pub docs_base_url: String,
}

fn default_namespace() -> String {
    "quarry".to_string()
}

fn default_docs_base_url() -> String {
    "https://quarry.dev/docs".to_string()
}

impl Manifest {
    /// Parse a manifest from TOML content, attributing errors to `filename`.
    pub fn from_str_with_filename(content: &str, filename: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(content)
            .map_err(|e| Error::parse(e, content, filename))?;

        if manifest.app.name.is_empty() {
            return Err(Error::validation(
                "app name must not be empty",
                content,
                filename,
            ));
        }

        Ok(manifest)
    }
}

/// Represents a quarry.toml file with both raw content and parsed manifest.
pub struct QuarryToml {
    path: PathBuf,
    content: String,
    manifest: Manifest,
}

impl QuarryToml {
    /// Open and parse a quarry.toml file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Box::new(Error::Io {
                path: path.clone(),
                source: e,
            })
        })?;
        let filename = path.display().to_string();
        let manifest = Manifest::from_str_with_filename(&content, &filename)?;

        Ok(Self {
            path,
            content,
            manifest,
        })
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the raw content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Get the parsed manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("failed to read '{path}'")]
    #[diagnostic(help("a Quarry application needs a quarry.toml at its root"))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse quarry.toml")]
    #[diagnostic(code(quarry::manifest_parse_error))]
    Parse {
        #[source_code]
        src: NamedSource<String>,
        #[label("parse error here")]
        span: Option<SourceSpan>,
        #[source]
        source: toml::de::Error,
    },

    #[error("{message}")]
    #[diagnostic(code(quarry::manifest_invalid))]
    Validation {
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: Option<SourceSpan>,
        message: String,
    },
}

impl Error {
    /// Create a parse error from a toml error with source context.
    pub fn parse(source: toml::de::Error, src: &str, filename: &str) -> Box<Self> {
        let span = source.span().map(SourceSpan::from);
        Box::new(Error::Parse {
            src: NamedSource::new(filename, src.to_string()),
            span,
            source,
        })
    }

    /// Create a validation error with source context.
    pub fn validation(message: impl Into<String>, src: &str, filename: &str) -> Box<Self> {
        Box::new(Error::Validation {
            src: NamedSource::new(filename, src.to_string()),
            span: None,
            message: message.into(),
        })
    }
}
