use std::borrow::Cow;
use std::sync::OnceLock;

use indexmap::IndexMap;
use log::debug;
use regex::{Captures, Regex};
use swc_core::{
    common::{SyntaxContext, DUMMY_SP},
    ecma::ast::{ImportPhase, *},
};

use crate::path::is_identifier;
use crate::resolver::{ImportStyle, ResolveError, ResolvedReference};

static ESCAPED_CHARS: OnceLock<Regex> = OnceLock::new();

/// Escapes a segment so distinct segments never share a name:
/// `_` doubles and any other non-alphanumeric becomes `_x<hex>_`.
fn escape_segment(segment: &str) -> Cow<'_, str> {
    ESCAPED_CHARS
        .get_or_init(|| Regex::new(r"[^A-Za-z0-9]").expect("valid escape regex"))
        .replace_all(segment, |caps: &Captures| {
            let c = caps[0].chars().next().unwrap_or('_');
            if c == '_' {
                "__".to_string()
            } else {
                format!("_x{:x}_", u32::from(c))
            }
        })
}

/// Local name for a dotted path, e.g. `$ui$main$notify$`.
pub fn mint(path: &[String], key: Option<&str>) -> String {
    let mut name = String::from("$");
    for segment in path.iter().map(String::as_str).chain(key) {
        name.push_str(&escape_segment(segment));
        name.push('$');
    }
    name
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Imported {
    Namespace,
    Default,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ImportBinding {
    source: String,
    imported: Imported,
}

impl ImportBinding {
    fn of(resolved: &ResolvedReference) -> Self {
        let imported = match resolved.style {
            ImportStyle::Namespace => Imported::Namespace,
            ImportStyle::Default => Imported::Default,
            ImportStyle::Named => Imported::Named(resolved.exported_object.clone()),
        };
        Self {
            source: resolved.module.clone(),
            imported,
        }
    }
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(i) => i.sym.to_string(),
        ModuleExportName::Str(s) => s.value.to_string(),
    }
}

/// Import bindings of one module: the ones already in the tree plus the ones queued.
#[derive(Debug, Default)]
pub struct ImportBook {
    bound: IndexMap<String, ImportBinding>,
    pending: Vec<ImportDecl>,
}

impl ImportBook {
    /// Reads the import bindings currently present in `items`.
    pub fn scan(items: &[ModuleItem]) -> Self {
        let mut book = Self::default();
        for item in items {
            let ModuleItem::ModuleDecl(ModuleDecl::Import(decl)) = item else {
                continue;
            };
            let source = decl.src.value.to_string();
            for specifier in &decl.specifiers {
                let (local, imported) = match specifier {
                    ImportSpecifier::Named(named) => (
                        named.local.sym.to_string(),
                        Imported::Named(
                            named
                                .imported
                                .as_ref()
                                .map(export_name)
                                .unwrap_or_else(|| named.local.sym.to_string()),
                        ),
                    ),
                    ImportSpecifier::Default(def) => (def.local.sym.to_string(), Imported::Default),
                    ImportSpecifier::Namespace(ns) => (ns.local.sym.to_string(), Imported::Namespace),
                };
                book.bound.insert(
                    local,
                    ImportBinding {
                        source: source.clone(),
                        imported,
                    },
                );
            }
        }
        book
    }

    /// Makes `local` an import of `resolved`. Returns `true` when it already was one.
    pub fn ensure_imported(
        &mut self,
        local: &str,
        resolved: &ResolvedReference,
    ) -> Result<bool, ResolveError> {
        let wanted = ImportBinding::of(resolved);
        if let Some(existing) = self.bound.get(local) {
            if *existing != wanted {
                return Err(ResolveError::AmbiguousBinding {
                    name: local.to_string(),
                });
            }
            return Ok(true);
        }
        debug!("minting `{local}` from {}", resolved.module);
        self.pending.push(import_decl(local, resolved));
        self.bound.insert(local.to_string(), wanted);
        Ok(false)
    }

    /// Places queued declarations after the last import, or at the top.
    pub fn insert_into(&mut self, body: &mut Vec<ModuleItem>) -> usize {
        let at = body
            .iter()
            .rposition(|item| matches!(item, ModuleItem::ModuleDecl(ModuleDecl::Import(_))))
            .map_or(0, |last| last + 1);
        let added = self.pending.len();
        body.splice(
            at..at,
            self.pending
                .drain(..)
                .map(|decl| ModuleItem::ModuleDecl(ModuleDecl::Import(decl))),
        );
        added
    }
}

fn import_decl(local: &str, resolved: &ResolvedReference) -> ImportDecl {
    let local_ident = Ident::new(local.into(), DUMMY_SP, SyntaxContext::empty());
    let specifier = match resolved.style {
        ImportStyle::Namespace => ImportSpecifier::Namespace(ImportStarAsSpecifier {
            span: DUMMY_SP,
            local: local_ident,
        }),
        ImportStyle::Default => ImportSpecifier::Default(ImportDefaultSpecifier {
            span: DUMMY_SP,
            local: local_ident,
        }),
        ImportStyle::Named => ImportSpecifier::Named(ImportNamedSpecifier {
            span: DUMMY_SP,
            local: local_ident,
            imported: (resolved.exported_object != local).then(|| {
                let exported = resolved.exported_object.as_str();
                if is_identifier(exported) {
                    ModuleExportName::Ident(Ident::new(
                        exported.into(),
                        DUMMY_SP,
                        SyntaxContext::empty(),
                    ))
                } else {
                    // `import { "sym-x" as ... }`
                    ModuleExportName::Str(Str {
                        span: DUMMY_SP,
                        value: exported.into(),
                        raw: None,
                    })
                }
            }),
            is_type_only: false,
        }),
    };
    ImportDecl {
        span: DUMMY_SP,
        specifiers: vec![specifier],
        src: Box::new(Str {
            span: DUMMY_SP,
            value: resolved.module.as_str().into(),
            raw: None,
        }),
        type_only: false,
        with: None,
        phase: ImportPhase::Evaluation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(dotted: &str) -> Vec<String> {
        dotted.split('.').map(str::to_string).collect()
    }

    fn named(module: &str, exported: &str) -> ResolvedReference {
        ResolvedReference {
            module: module.into(),
            exported_object: exported.into(),
            style: ImportStyle::Named,
            binding: vec![],
            rest: vec![],
        }
    }

    #[test]
    fn mints_stable_sentinel_wrapped_names() {
        assert_eq!(mint(&segs("ui.main.notify"), None), "$ui$main$notify$");
        assert_eq!(mint(&segs("ui.main"), Some("notify")), mint(&segs("ui.main.notify"), None));
        assert_eq!(mint(&segs("me.helper-ui"), None), "$me$helper_x2d_ui$");
    }

    #[test]
    fn escaping_keeps_distinct_segments_apart() {
        let names = [
            mint(&segs("domain.mod-b.x"), None),
            mint(&segs("domain.mod_b.x"), None),
            mint(&segs("domain.mod__b.x"), None),
            mint(&segs("domain.modé.x"), None),
            mint(&segs("domain.mod_xe9_.x"), None),
        ];
        assert_eq!(names[0], "$domain$mod_x2d_b$x$");
        assert_eq!(names[1], "$domain$mod__b$x$");
        assert_eq!(names[3], "$domain$mod_xe9_$x$");
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn non_identifier_exports_are_imported_by_string_name() {
        let decl = import_decl("$domain$modA$sym_x2d_x$", &named("pkg/modA", "sym-x"));
        let ImportSpecifier::Named(specifier) = &decl.specifiers[0] else {
            panic!("expected a named specifier");
        };
        assert!(matches!(
            &specifier.imported,
            Some(ModuleExportName::Str(s)) if &*s.value == "sym-x"
        ));

        let decl = import_decl("$domain$modA$symbolX$", &named("pkg/modA", "symbolX"));
        let ImportSpecifier::Named(specifier) = &decl.specifiers[0] else {
            panic!("expected a named specifier");
        };
        assert!(matches!(&specifier.imported, Some(ModuleExportName::Ident(_))));
    }

    #[test]
    fn second_request_for_a_name_is_a_no_op() {
        let mut book = ImportBook::default();
        let resolved = named("pkg/modA", "symbolX");
        assert!(!book.ensure_imported("$domain$modA$symbolX$", &resolved).unwrap());
        assert!(book.ensure_imported("$domain$modA$symbolX$", &resolved).unwrap());

        let mut body = vec![];
        assert_eq!(book.insert_into(&mut body), 1);
        assert_eq!(book.insert_into(&mut body), 0);
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn same_name_for_another_import_is_ambiguous() {
        let mut book = ImportBook::default();
        book.ensure_imported("Main", &named("pkg/main", "x")).unwrap();
        let err = book.ensure_imported("Main", &named("pkg/other", "x")).unwrap_err();
        assert_eq!(err, ResolveError::AmbiguousBinding { name: "Main".into() });
    }

    #[test]
    fn scan_sees_existing_imports_and_insertion_follows_them() {
        let st = ResolvedReference {
            module: "gi://St".into(),
            exported_object: String::new(),
            style: ImportStyle::Default,
            binding: vec![],
            rest: vec![],
        };
        let existing = ModuleItem::ModuleDecl(ModuleDecl::Import(import_decl("St", &st)));
        let stmt = ModuleItem::Stmt(Stmt::Empty(EmptyStmt { span: DUMMY_SP }));
        let mut body = vec![existing, stmt];

        let mut book = ImportBook::scan(&body);
        assert!(book.ensure_imported("St", &st).unwrap());
        assert!(!book.ensure_imported("$x$", &named("pkg/x", "x")).unwrap());
        book.insert_into(&mut body);

        assert!(matches!(&body[1], ModuleItem::ModuleDecl(ModuleDecl::Import(d)) if d.src.value.to_string() == "pkg/x"));
        assert!(matches!(&body[2], ModuleItem::Stmt(Stmt::Empty(_))));
    }
}
