use indexmap::IndexMap;
use log::trace;
use swc_core::{
    common::{Span, DUMMY_SP},
    ecma::{
        ast::*,
        visit::{VisitMut, VisitMutWith},
    },
};

// -----------------------------------------------------------------------------
// Export promotion
// -----------------------------------------------------------------------------

/// Exports top-level functions and `var`s; `var X = class Y {}` becomes a
/// class declaration.
#[derive(Debug, Default)]
pub struct ExportNormalizer {
    /// Exported binding name -> the class's own name.
    renames: IndexMap<String, String>,
}

fn export_decl(span: Span, decl: Decl) -> ModuleItem {
    ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl { span, decl }))
}

fn export_alias(internal: Ident, exported: Ident) -> ModuleItem {
    ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(NamedExport {
        span: DUMMY_SP,
        specifiers: vec![ExportSpecifier::Named(ExportNamedSpecifier {
            span: DUMMY_SP,
            orig: ModuleExportName::Ident(internal),
            exported: Some(ModuleExportName::Ident(exported)),
            is_type_only: false,
        })],
        src: None,
        type_only: false,
        with: None,
    }))
}

/// Splits a `X = class ...` declarator off; anything else is handed back.
fn class_declarator(mut decl: VarDeclarator) -> Result<(Ident, ClassExpr), VarDeclarator> {
    let binding = match &decl.name {
        Pat::Ident(b) => b.id.clone(),
        _ => return Err(decl),
    };
    match decl.init.take().map(|init| *init) {
        Some(Expr::Class(class)) => Ok((binding, class)),
        init => {
            decl.init = init.map(Box::new);
            Err(decl)
        }
    }
}

impl ExportNormalizer {
    /// Binding renames the rename pass has to apply.
    pub fn into_renames(self) -> IndexMap<String, String> {
        self.renames
    }

    fn export_var(&mut self, var: VarDecl, out: &mut Vec<ModuleItem>) {
        let VarDecl {
            span,
            ctxt,
            kind,
            declare,
            decls,
        } = var;
        let mut pending = Vec::new();
        let flush = |pending: &mut Vec<VarDeclarator>, out: &mut Vec<ModuleItem>| {
            if pending.is_empty() {
                return;
            }
            out.push(export_decl(
                span,
                Decl::Var(Box::new(VarDecl {
                    span,
                    ctxt,
                    kind,
                    declare,
                    decls: std::mem::take(pending),
                })),
            ));
        };

        for decl in decls {
            match class_declarator(decl) {
                Ok((binding, ClassExpr { ident, class })) => {
                    // Keep evaluation order: earlier declarators are emitted first.
                    flush(&mut pending, out);
                    match ident {
                        Some(internal) if internal.sym != binding.sym => {
                            trace!("exporting class `{}` as `{}`", internal.sym, binding.sym);
                            self.renames
                                .insert(binding.sym.to_string(), internal.sym.to_string());
                            out.push(ModuleItem::Stmt(Stmt::Decl(Decl::Class(ClassDecl {
                                ident: internal.clone(),
                                declare: false,
                                class,
                            }))));
                            out.push(export_alias(internal, binding));
                        }
                        _ => out.push(export_decl(
                            span,
                            Decl::Class(ClassDecl {
                                ident: binding,
                                declare: false,
                                class,
                            }),
                        )),
                    }
                }
                Err(decl) => pending.push(decl),
            }
        }
        flush(&mut pending, out);
    }
}

impl VisitMut for ExportNormalizer {
    fn visit_mut_module(&mut self, module: &mut Module) {
        let body = std::mem::take(&mut module.body);
        for item in body {
            match item {
                ModuleItem::Stmt(Stmt::Decl(Decl::Fn(f))) if !f.declare => {
                    let span = f.function.span;
                    module.body.push(export_decl(span, Decl::Fn(f)));
                }
                ModuleItem::Stmt(Stmt::Decl(Decl::Var(var)))
                    if var.kind == VarDeclKind::Var && !var.declare =>
                {
                    self.export_var(*var, &mut module.body);
                }
                other => module.body.push(other),
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Rename propagation
// -----------------------------------------------------------------------------

/// Points every reference to a renamed class binding at the class's own name.
pub struct ClassBindingRenamer {
    renames: IndexMap<String, String>,
}

impl ClassBindingRenamer {
    pub fn new(renames: IndexMap<String, String>) -> Self {
        Self { renames }
    }

    fn renamed(&self, ident: &Ident) -> Option<Ident> {
        self.renames
            .get(&*ident.sym)
            .map(|to| Ident::new(to.as_str().into(), ident.span, ident.ctxt))
    }
}

impl VisitMut for ClassBindingRenamer {
    fn visit_mut_ident(&mut self, ident: &mut Ident) {
        if let Some(renamed) = self.renamed(ident) {
            *ident = renamed;
        }
    }

    fn visit_mut_prop(&mut self, prop: &mut Prop) {
        // `{ Bar }` keeps its key: `{ Bar: Baz }`.
        if let Prop::Shorthand(ident) = prop {
            if let Some(renamed) = self.renamed(ident) {
                *prop = Prop::KeyValue(KeyValueProp {
                    key: PropName::Ident(IdentName::new(ident.sym.clone(), ident.span)),
                    value: Box::new(Expr::Ident(renamed)),
                });
                return;
            }
        }
        prop.visit_mut_children_with(self);
    }

    fn visit_mut_object_pat_prop(&mut self, prop: &mut ObjectPatProp) {
        if let ObjectPatProp::Assign(assign) = prop {
            if let Some(renamed) = self.renamed(&assign.key.id) {
                let key = PropName::Ident(IdentName::new(assign.key.id.sym.clone(), assign.key.id.span));
                let mut value = assign.value.take();
                value.visit_mut_with(self);
                let binding = Pat::Ident(BindingIdent {
                    id: renamed,
                    type_ann: assign.key.type_ann.take(),
                });
                let value = match value {
                    Some(right) => Pat::Assign(AssignPat {
                        span: assign.span,
                        left: Box::new(binding),
                        right,
                    }),
                    None => binding,
                };
                *prop = ObjectPatProp::KeyValue(KeyValuePatProp {
                    key,
                    value: Box::new(value),
                });
                return;
            }
        }
        prop.visit_mut_children_with(self);
    }

    fn visit_mut_export_named_specifier(&mut self, specifier: &mut ExportNamedSpecifier) {
        // The exported name is public and never renamed.
        if let ModuleExportName::Ident(orig) = &mut specifier.orig {
            if let Some(renamed) = self.renamed(orig) {
                if specifier.exported.is_none() {
                    specifier.exported = Some(ModuleExportName::Ident(orig.clone()));
                }
                *orig = renamed;
            }
        }
    }
}
