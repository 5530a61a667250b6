use std::collections::HashSet;

use indexmap::IndexMap;
use log::debug;
use swc_core::{
    common::{SyntaxContext, DUMMY_SP},
    ecma::{
        ast::*,
        visit::{VisitMut, VisitMutWith},
    },
};

use crate::minter::mint;
use crate::path::{ident_expr, is_identifier, DottedPath, PathWalker};
use crate::resolver::{resolve, ResolveError};
use crate::table::ResolutionTable;

/// Replaces legacy directory accesses used as a whole (or indexed with a
/// dynamic key) by a local object listing the directory's modules.
///
/// `imports.ui.status[name]` becomes `$ui$status$[name]` with
///
/// ```js
/// let $ui$status$ = { volume: imports.ui.status.volume, network: imports.ui.status.network };
/// ```
///
/// The property values are left in legacy form for [`crate::ImportRewriter`].
pub struct NamespaceCollapser<'a> {
    table: &'a ResolutionTable,
    walker: PathWalker<'a>,
    declared: HashSet<String>,
    synthesized: IndexMap<String, DottedPath>,
}

impl<'a> NamespaceCollapser<'a> {
    pub fn new(table: &'a ResolutionTable) -> Self {
        Self {
            table,
            walker: PathWalker::new(table),
            declared: HashSet::new(),
            synthesized: IndexMap::new(),
        }
    }

    /// Local name of the object standing in for `path`, if it needs one.
    fn collapse(&mut self, path: &DottedPath) -> Option<String> {
        if !matches!(
            resolve(self.table, &path.segments, None),
            Err(ResolveError::UnknownModule { .. })
        ) {
            return None;
        }
        if self.table.children(&path.segments).is_empty() {
            return None;
        }
        let name = mint(&path.segments, None);
        if self.declared.contains(&name) {
            return None;
        }
        self.synthesized.entry(name.clone()).or_insert_with(|| DottedPath {
            computed: false,
            ..path.clone()
        });
        Some(name)
    }

    fn namespace_object(&self, name: &str, path: &DottedPath) -> ModuleItem {
        let props = self
            .table
            .children(&path.segments)
            .into_iter()
            .map(|child| {
                let key = if is_identifier(child) {
                    PropName::Ident(IdentName::new(child.into(), DUMMY_SP))
                } else {
                    PropName::Str(Str {
                        span: DUMMY_SP,
                        value: child.into(),
                        raw: None,
                    })
                };
                PropOrSpread::Prop(Box::new(Prop::KeyValue(KeyValueProp {
                    key,
                    value: Box::new(path.child(child).to_expr()),
                })))
            })
            .collect();

        ModuleItem::Stmt(Stmt::Decl(Decl::Var(Box::new(VarDecl {
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            kind: VarDeclKind::Let,
            declare: false,
            decls: vec![VarDeclarator {
                span: DUMMY_SP,
                name: Pat::Ident(Ident::new(name.into(), DUMMY_SP, SyntaxContext::empty()).into()),
                init: Some(Box::new(Expr::Object(ObjectLit {
                    span: DUMMY_SP,
                    props,
                }))),
                definite: false,
            }],
        }))))
    }
}

fn add_declared(decl: &Decl, names: &mut HashSet<String>) {
    match decl {
        Decl::Class(c) => {
            names.insert(c.ident.sym.to_string());
        }
        Decl::Fn(f) => {
            names.insert(f.ident.sym.to_string());
        }
        Decl::Var(v) => {
            for d in &v.decls {
                if let Pat::Ident(b) = &d.name {
                    names.insert(b.id.sym.to_string());
                }
            }
        }
        _ => {}
    }
}

/// Names bound at the top level of `items`.
fn top_level_names(items: &[ModuleItem]) -> HashSet<String> {
    let mut names = HashSet::new();
    for item in items {
        match item {
            ModuleItem::Stmt(Stmt::Decl(decl)) => add_declared(decl, &mut names),
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => {
                add_declared(&export.decl, &mut names)
            }
            ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
                for specifier in &import.specifiers {
                    let local = match specifier {
                        ImportSpecifier::Named(s) => &s.local,
                        ImportSpecifier::Default(s) => &s.local,
                        ImportSpecifier::Namespace(s) => &s.local,
                    };
                    names.insert(local.sym.to_string());
                }
            }
            _ => {}
        }
    }
    names
}

impl VisitMut for NamespaceCollapser<'_> {
    fn visit_mut_module(&mut self, module: &mut Module) {
        self.declared = top_level_names(&module.body);
        module.visit_mut_children_with(self);

        if self.synthesized.is_empty() {
            return;
        }
        let at = module
            .body
            .iter()
            .rposition(|item| matches!(item, ModuleItem::ModuleDecl(ModuleDecl::Import(_))))
            .map_or(0, |last| last + 1);
        let objects: Vec<ModuleItem> = self
            .synthesized
            .iter()
            .map(|(name, path)| {
                debug!("synthesized `{name}` for {path}");
                self.namespace_object(name, path)
            })
            .collect();
        module.body.splice(at..at, objects);
        self.synthesized.clear();
    }

    fn visit_mut_var_declarator(&mut self, decl: &mut VarDeclarator) {
        decl.name.visit_mut_with(self);
        let Some(init) = decl.init.as_deref_mut() else {
            return;
        };
        // Destructured modules are imported property by property.
        if matches!(decl.name, Pat::Object(_)) && self.walker.walk_static(init).is_some() {
            return;
        }
        init.visit_mut_with(self);
    }

    fn visit_mut_assign_expr(&mut self, assign: &mut AssignExpr) {
        let legacy_target = match &assign.left {
            AssignTarget::Simple(SimpleAssignTarget::Member(member)) => self
                .walker
                .walk_member(member)
                .is_some_and(|path| !path.computed),
            _ => false,
        };
        if !legacy_target {
            assign.left.visit_mut_with(self);
        }
        assign.right.visit_mut_with(self);
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        let Some(path) = self.walker.walk(expr) else {
            expr.visit_mut_children_with(self);
            return;
        };
        if path.computed {
            if let Expr::Member(member) = expr {
                if let Some(name) = self.collapse(&path) {
                    member.obj = Box::new(ident_expr(&name));
                }
                member.prop.visit_mut_with(self);
            }
        } else if let Some(name) = self.collapse(&path) {
            *expr = ident_expr(&name);
        }
    }
}
