use std::borrow::Cow;
use std::path::PathBuf;

use serde::Deserialize;

use crate::source::{transform_source, Grammar, TransformError, TransformOutput};
use crate::table::{ResolutionTable, TableError};

/// Switches for the passes after import rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Promote top-level functions and `var`s to exports.
    pub export_declarations: bool,
    /// Leave a block comment on every access that could not be resolved.
    pub annotate: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            export_declarations: true,
            annotate: true,
        }
    }
}

/// Where the resolution table comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TableSource {
    Path(PathBuf),
    Inline(serde_json::Value),
}

/// Plugin configuration, as passed by the host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub table: Option<TableSource>,
    pub grammar: Grammar,
    #[serde(flatten)]
    pub options: Options,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Loads the configured table, falling back to the built-in GNOME Shell one.
    pub fn table(&self) -> Result<Cow<'static, ResolutionTable>, TableError> {
        match &self.table {
            None => Ok(Cow::Borrowed(ResolutionTable::gnome_shell())),
            Some(TableSource::Path(path)) => ResolutionTable::from_path(path).map(Cow::Owned),
            Some(TableSource::Inline(value)) => {
                ResolutionTable::from_value(value.clone()).map(Cow::Owned)
            }
        }
    }

    /// Transforms one file with this configuration.
    pub fn transform(&self, name: &str, source: &str) -> Result<TransformOutput, TransformError> {
        let table = self.table()?;
        transform_source(name, source, self.grammar, &table, &self.options)
    }
}
