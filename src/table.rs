use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use indexmap::IndexMap;
use serde::Deserialize;

/// The identifier whose member chains encode a legacy import.
pub const LEGACY_ROOT: &str = "imports";

static GNOME_SHELL: OnceLock<ResolutionTable> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("failed to read resolution table {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed resolution table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("domain `{domain}`: module paths `{first}` and `{second}` overlap")]
    OverlappingModules {
        domain: String,
        first: String,
        second: String,
    },
    #[error("domain `{domain}`: module `{module}` has no specifier and no remap rule")]
    MissingSpecifier { domain: String, module: String },
    #[error("remap rule given for unknown domain `{0}`")]
    UnknownRemapDomain(String),
    #[error("alias `{alias}` targets unknown domain `{domain}`")]
    UnknownAliasDomain { alias: String, domain: String },
}

/// Rewrites the specifier of every module in a domain, e.g. `gi://{module}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemapRule {
    pub template: String,
    /// Whole-module imports become default imports instead of namespace imports.
    #[serde(default)]
    pub default_import: bool,
    /// Names under the domain that are never taken as a module, e.g. `gi.versions`.
    #[serde(default)]
    pub reserved: Vec<String>,
}

impl RemapRule {
    pub fn reserves(&self, segment: &str) -> bool {
        self.reserved.iter().any(|r| r == segment)
    }

    pub fn apply(&self, module_path: &[String]) -> String {
        self.template.replace("{module}", &module_path.join("/"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Segments after the domain; empty for a domain that is itself a module.
    pub path: Vec<String>,
    pub specifier: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DomainTable {
    records: Vec<ModuleRecord>,
}

impl DomainTable {
    pub fn records(&self) -> &[ModuleRecord] {
        &self.records
    }

    /// The recorded module path that is the longest prefix of `tail`.
    pub fn longest_match(&self, tail: &[String]) -> Option<&ModuleRecord> {
        self.records
            .iter()
            .filter(|r| tail.starts_with(&r.path))
            .max_by_key(|r| r.path.len())
    }

    /// True when `prefix` is a proper prefix of some recorded module path.
    pub fn is_directory(&self, prefix: &[String]) -> bool {
        self.records
            .iter()
            .any(|r| r.path.len() > prefix.len() && r.path.starts_with(prefix))
    }
}

/// A source-level chain that stands for the legacy root.
///
/// `imports` carries no implicit domain: its first segment is the domain.
/// An alias such as `Me.imports` maps onto a fixed domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootAlias {
    pub chain: Vec<String>,
    pub domain: Option<String>,
}

#[derive(Deserialize)]
struct RawTable {
    #[serde(default)]
    domains: IndexMap<String, RawDomain>,
    #[serde(default)]
    remaps: IndexMap<String, RemapRule>,
    #[serde(default)]
    aliases: IndexMap<String, String>,
}

#[derive(Deserialize)]
struct RawDomain {
    #[serde(default)]
    modules: IndexMap<String, Option<String>>,
}

/// Process-wide, read-only lookup from legacy domains to module specifiers.
#[derive(Debug, Clone)]
pub struct ResolutionTable {
    domains: IndexMap<String, DomainTable>,
    remaps: IndexMap<String, RemapRule>,
    roots: Vec<RootAlias>,
}

impl Default for ResolutionTable {
    fn default() -> Self {
        Self {
            domains: IndexMap::new(),
            remaps: IndexMap::new(),
            roots: vec![RootAlias {
                chain: vec![LEGACY_ROOT.to_string()],
                domain: None,
            }],
        }
    }
}

fn split_path(dotted: &str) -> Vec<String> {
    if dotted.is_empty() {
        return vec![];
    }
    dotted.split('.').map(str::to_string).collect()
}

impl ResolutionTable {
    pub fn from_json(json: &str) -> Result<Self, TableError> {
        Self::from_raw(serde_json::from_str(json)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, TableError> {
        Self::from_raw(serde_json::from_value(value)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let json = std::fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The table for GNOME Shell extensions, parsed once per process.
    pub fn gnome_shell() -> &'static ResolutionTable {
        GNOME_SHELL.get_or_init(|| {
            Self::from_json(include_str!("../data/gnome-shell.json"))
                .expect("embedded GNOME Shell table is valid")
        })
    }

    fn from_raw(raw: RawTable) -> Result<Self, TableError> {
        let mut table = ResolutionTable::default();

        for name in raw.remaps.keys() {
            if !raw.domains.contains_key(name) {
                return Err(TableError::UnknownRemapDomain(name.clone()));
            }
        }

        for (domain, entry) in raw.domains {
            let remapped = raw.remaps.contains_key(&domain);
            let mut records: Vec<ModuleRecord> = Vec::with_capacity(entry.modules.len());
            for (module, specifier) in entry.modules {
                if specifier.is_none() && !remapped {
                    return Err(TableError::MissingSpecifier { domain, module });
                }
                let path = split_path(&module);
                if let Some(other) = records
                    .iter()
                    .find(|r| r.path.starts_with(&path) || path.starts_with(&r.path))
                {
                    return Err(TableError::OverlappingModules {
                        domain,
                        first: other.path.join("."),
                        second: module,
                    });
                }
                records.push(ModuleRecord { path, specifier });
            }
            table.domains.insert(domain, DomainTable { records });
        }

        for (alias, domain) in raw.aliases {
            if !table.domains.contains_key(&domain) {
                return Err(TableError::UnknownAliasDomain { alias, domain });
            }
            table.roots.push(RootAlias {
                chain: split_path(&alias),
                domain: Some(domain),
            });
        }
        // Longer chains first so `Me.imports` is tried before a bare `Me`.
        table.roots.sort_by(|a, b| b.chain.len().cmp(&a.chain.len()));
        table.remaps = raw.remaps;

        Ok(table)
    }

    pub fn domain(&self, name: &str) -> Option<&DomainTable> {
        self.domains.get(name)
    }

    pub fn remap(&self, domain: &str) -> Option<&RemapRule> {
        self.remaps.get(domain)
    }

    pub fn roots(&self) -> &[RootAlias] {
        &self.roots
    }

    /// Segments that extend `path` (domain first) by exactly one to a recorded module.
    pub fn children(&self, path: &[String]) -> Vec<&str> {
        let Some((domain, tail)) = path.split_first() else {
            return vec![];
        };
        let Some(entry) = self.domains.get(domain) else {
            return vec![];
        };
        entry
            .records
            .iter()
            .filter(|r| r.path.len() == tail.len() + 1 && r.path.starts_with(tail))
            .filter_map(|r| r.path.last().map(String::as_str))
            .collect()
    }
}
