use crate::table::ResolutionTable;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("unknown domain `{0}`")]
    UnknownDomain(String),
    #[error("no module of domain `{domain}` matches `{path}`")]
    UnknownModule { domain: String, path: String },
    #[error("`{name}` is already bound to a different import")]
    AmbiguousBinding { name: String },
    #[error("`{path}` would become an import binding, which is read-only")]
    ImportAssignment { path: String },
    #[error("`{path}` would write into a module namespace, which is read-only")]
    NamespaceAssignment { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStyle {
    Namespace,
    Default,
    Named,
}

/// Where a dotted path ends up once the table has been consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    /// Final module specifier.
    pub module: String,
    /// Empty when the whole module is imported.
    pub exported_object: String,
    pub style: ImportStyle,
    /// Domain-first segments the local binding stands for.
    pub binding: Vec<String>,
    /// Member accesses that stay on the binding.
    pub rest: Vec<String>,
}

impl ResolvedReference {
    /// Imports the module itself and keeps the exported object as a member access.
    pub fn narrowed_to_module(mut self) -> Self {
        if self.style == ImportStyle::Named {
            let exported = std::mem::take(&mut self.exported_object);
            self.binding.pop();
            self.rest.insert(0, exported);
            self.style = ImportStyle::Namespace;
        }
        self
    }
}

/// Resolves `path` (domain first), optionally extended by an object `key`.
pub fn resolve(
    table: &ResolutionTable,
    path: &[String],
    key: Option<&str>,
) -> Result<ResolvedReference, ResolveError> {
    let mut full = path.to_vec();
    full.extend(key.map(str::to_string));

    let Some((domain, tail)) = full.split_first() else {
        return Err(ResolveError::UnknownDomain(String::new()));
    };
    let entry = table
        .domain(domain)
        .ok_or_else(|| ResolveError::UnknownDomain(domain.clone()))?;
    let remap = table.remap(domain);
    let unknown_module = || ResolveError::UnknownModule {
        domain: domain.clone(),
        path: full.join("."),
    };

    let (module_path, specifier) = match entry.longest_match(tail) {
        Some(record) => {
            let specifier = match (remap, &record.specifier) {
                (Some(rule), _) => rule.apply(&record.path),
                (None, Some(specifier)) => specifier.clone(),
                (None, None) => return Err(unknown_module()),
            };
            (record.path.clone(), specifier)
        }
        // Reflective domains accept any module name that is not a known directory.
        None => match (remap, tail.first()) {
            (Some(rule), Some(first))
                if !rule.reserves(first) && !entry.is_directory(std::slice::from_ref(first)) =>
            {
                let module_path = vec![first.clone()];
                let specifier = rule.apply(&module_path);
                (module_path, specifier)
            }
            _ => return Err(unknown_module()),
        },
    };

    let remainder = &tail[module_path.len()..];
    let mut binding = Vec::with_capacity(module_path.len() + 2);
    binding.push(domain.clone());
    binding.extend(module_path);

    let default_import = remap.is_some_and(|rule| rule.default_import);
    let resolved = match remainder.split_first() {
        Some((exported, rest)) if !default_import => {
            binding.push(exported.clone());
            ResolvedReference {
                module: specifier,
                exported_object: exported.clone(),
                style: ImportStyle::Named,
                binding,
                rest: rest.to_vec(),
            }
        }
        _ => ResolvedReference {
            module: specifier,
            exported_object: String::new(),
            style: if default_import {
                ImportStyle::Default
            } else {
                ImportStyle::Namespace
            },
            binding,
            rest: remainder.to_vec(),
        },
    };
    Ok(resolved)
}
