use log::{debug, trace};
use swc_core::{
    common::{Span, Spanned, SyntaxContext, DUMMY_SP},
    ecma::{
        ast::*,
        visit::{VisitMut, VisitMutWith},
    },
};

use crate::diagnostics::{Reporter, RewriteContext};
use crate::minter::{mint, ImportBook};
use crate::path::{ident_expr, member_chain, DottedPath, PathWalker};
use crate::resolver::{resolve, ImportStyle, ResolveError};
use crate::table::ResolutionTable;

// -----------------------------------------------------------------------------
// Statement lists
// -----------------------------------------------------------------------------

/// Statement-list element: `Stmt` in blocks, `ModuleItem` at module level.
trait StmtSlot: Sized {
    fn var_decl_mut(&mut self) -> Option<&mut VarDecl>;
    fn from_stmt(stmt: Stmt) -> Self;
}

impl StmtSlot for Stmt {
    fn var_decl_mut(&mut self) -> Option<&mut VarDecl> {
        match self {
            Stmt::Decl(Decl::Var(var)) => Some(&mut **var),
            _ => None,
        }
    }

    fn from_stmt(stmt: Stmt) -> Self {
        stmt
    }
}

impl StmtSlot for ModuleItem {
    fn var_decl_mut(&mut self) -> Option<&mut VarDecl> {
        match self {
            ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) => Some(&mut **var),
            _ => None,
        }
    }

    fn from_stmt(stmt: Stmt) -> Self {
        ModuleItem::Stmt(stmt)
    }
}

fn var_stmt(kind: VarDeclKind, local: &BindingIdent, init: Expr) -> Stmt {
    Stmt::Decl(Decl::Var(Box::new(VarDecl {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        kind,
        declare: false,
        decls: vec![VarDeclarator {
            span: DUMMY_SP,
            name: Pat::Ident(local.clone()),
            init: Some(Box::new(init)),
            definite: false,
        }],
    })))
}

fn prop_key(key: &PropName) -> Option<String> {
    match key {
        PropName::Ident(i) => Some(i.sym.to_string()),
        PropName::Str(s) => Some(s.value.to_string()),
        _ => None,
    }
}

/// Name used in reports for what a declarator binds.
fn binding_subject(pat: &Pat) -> Option<String> {
    match pat {
        Pat::Ident(b) => Some(b.id.sym.to_string()),
        Pat::Object(object) => {
            let keys: Vec<String> = object
                .props
                .iter()
                .filter_map(|prop| match prop {
                    ObjectPatProp::KeyValue(kv) => prop_key(&kv.key),
                    ObjectPatProp::Assign(a) => Some(a.key.id.sym.to_string()),
                    ObjectPatProp::Rest(_) => Some("...".to_string()),
                })
                .collect();
            Some(format!("{{ {} }}", keys.join(", ")))
        }
        _ => None,
    }
}

fn with_span(mut expr: Expr, span: Span) -> Expr {
    match &mut expr {
        Expr::Ident(i) => i.span = span,
        Expr::Member(m) => m.span = span,
        _ => {}
    }
    expr
}

// -----------------------------------------------------------------------------
// Import rewriting
// -----------------------------------------------------------------------------

/// Turns every resolvable legacy access into a reference to an import.
pub struct ImportRewriter<'a, 'r> {
    table: &'a ResolutionTable,
    walker: PathWalker<'a>,
    book: ImportBook,
    reporter: &'a mut Reporter<'r>,
}

impl<'a, 'r> ImportRewriter<'a, 'r> {
    pub fn new(table: &'a ResolutionTable, reporter: &'a mut Reporter<'r>) -> Self {
        Self {
            table,
            walker: PathWalker::new(table),
            book: ImportBook::default(),
            reporter,
        }
    }

    fn rewrite_block<T>(&mut self, items: &mut Vec<T>, top: bool)
    where
        T: StmtSlot + VisitMutWith<Self>,
    {
        let mut out = Vec::with_capacity(items.len());
        for mut item in items.drain(..) {
            let mut siblings = vec![];
            let keep = match item.var_decl_mut() {
                Some(var) => {
                    self.absorb_declarators(var, top, &mut siblings);
                    !var.decls.is_empty()
                }
                None => true,
            };
            if keep {
                item.visit_mut_with(self);
                out.push(item);
            }
            out.extend(siblings.into_iter().map(T::from_stmt));
        }
        *items = out;
    }

    /// Drops declarators the imports now stand in for.
    fn absorb_declarators(&mut self, var: &mut VarDecl, top: bool, siblings: &mut Vec<Stmt>) {
        let kind = var.kind;
        var.decls.retain_mut(|decl| {
            let Some(path) = decl.init.as_deref().and_then(|init| self.walker.walk_static(init))
            else {
                return true;
            };
            match &mut decl.name {
                Pat::Ident(binding) if top && kind != VarDeclKind::Var => {
                    !self.import_as(&binding.id.sym, &path)
                }
                Pat::Object(pattern) => {
                    self.destructure(pattern, &path, kind, siblings);
                    !pattern.props.is_empty()
                }
                _ => true,
            }
        });
    }

    /// Binds `path` directly under `local`. Failures are left to the declarator visit.
    fn import_as(&mut self, local: &str, path: &DottedPath) -> bool {
        let Ok(resolved) = resolve(self.table, &path.segments, None) else {
            return false;
        };
        if !resolved.rest.is_empty() {
            return false;
        }
        match self.book.ensure_imported(local, &resolved) {
            Ok(_) => {
                trace!("{path} imported as `{local}`");
                true
            }
            Err(_) => false,
        }
    }

    /// Moves every resolvable property out of the pattern into its own declaration.
    fn destructure(
        &mut self,
        pattern: &mut ObjectPat,
        path: &DottedPath,
        kind: VarDeclKind,
        siblings: &mut Vec<Stmt>,
    ) {
        pattern.props.retain(|prop| {
            let (key, local) = match prop {
                ObjectPatProp::KeyValue(kv) => match (prop_key(&kv.key), &*kv.value) {
                    (Some(key), Pat::Ident(local)) => (key, local.clone()),
                    _ => return true,
                },
                ObjectPatProp::Assign(a) if a.value.is_none() => {
                    (a.key.id.sym.to_string(), a.key.clone())
                }
                _ => return true,
            };
            let Ok(resolved) = resolve(self.table, &path.segments, Some(&key)) else {
                return true;
            };
            let minted = mint(&resolved.binding, None);
            if self.book.ensure_imported(&minted, &resolved).is_err() {
                return true;
            }
            trace!("{path} destructured `{key}` into `{}`", local.id.sym);
            siblings.push(var_stmt(
                kind,
                &local,
                member_chain(ident_expr(&minted), &resolved.rest),
            ));
            false
        });
    }

    /// Expression the legacy access at `path` is replaced with.
    fn replacement(&mut self, path: &DottedPath, context: RewriteContext) -> Result<Expr, ResolveError> {
        let mut resolved = resolve(self.table, &path.segments, None)?;
        match context {
            RewriteContext::Callee if resolved.rest.is_empty() => {
                resolved = resolved.narrowed_to_module();
            }
            RewriteContext::AssignTarget if resolved.rest.is_empty() => {
                return Err(ResolveError::ImportAssignment {
                    path: path.to_string(),
                });
            }
            RewriteContext::KeyedTarget
                if resolved.rest.is_empty() && resolved.style == ImportStyle::Namespace =>
            {
                return Err(ResolveError::NamespaceAssignment {
                    path: path.to_string(),
                });
            }
            _ => {}
        }
        let local = mint(&resolved.binding, None);
        self.book.ensure_imported(&local, &resolved)?;
        Ok(member_chain(ident_expr(&local), &resolved.rest))
    }

    fn rewrite(
        &mut self,
        expr: &mut Expr,
        path: &DottedPath,
        context: RewriteContext,
        subject: Option<&str>,
    ) {
        let span = expr.span();
        match self.replacement(path, context) {
            Ok(replacement) => {
                trace!("rewrote {path}");
                if path.implicit_domain && !matches!(context, RewriteContext::Declarator) {
                    self.reporter
                        .note(span, &format!("was an inline import of `{path}`"));
                }
                *expr = with_span(replacement, span);
            }
            Err(err) => self.reporter.report(span, path, context, subject, &err),
        }
    }

    /// Rewrites a member expression that is written to or deleted.
    fn rewrite_target(&mut self, member: &mut MemberExpr) {
        let Some(path) = self.walker.walk_member(member) else {
            member.visit_mut_with(self);
            return;
        };
        if path.computed {
            // `imports.x.y[key] = v`: the object stays readable, the key stays dynamic.
            let context = RewriteContext::KeyedTarget;
            match self.replacement(&path, context) {
                Ok(obj) => {
                    let span = member.obj.span();
                    member.obj = Box::new(with_span(obj, span));
                }
                Err(err) => self.reporter.report(member.span, &path, context, None, &err),
            }
            member.prop.visit_mut_with(self);
            return;
        }
        match self.replacement(&path, RewriteContext::AssignTarget) {
            // Targets always keep at least one member access.
            Ok(Expr::Member(mut replacement)) => {
                replacement.span = member.span;
                *member = replacement;
            }
            Ok(_) => {}
            Err(err) => self.reporter.report(
                member.span,
                &path,
                RewriteContext::AssignTarget,
                None,
                &err,
            ),
        }
    }

    fn rewrite_or_visit(&mut self, expr: &mut Expr, context: RewriteContext, subject: Option<&str>) {
        match self.walker.walk_static(expr) {
            Some(path) => self.rewrite(expr, &path, context, subject),
            None => expr.visit_mut_with(self),
        }
    }
}

impl VisitMut for ImportRewriter<'_, '_> {
    fn visit_mut_module(&mut self, module: &mut Module) {
        // Bindings are re-read from the tree on every run.
        self.book = ImportBook::scan(&module.body);
        self.rewrite_block(&mut module.body, true);
        let added = self.book.insert_into(&mut module.body);
        if added > 0 {
            debug!("added {added} import declaration(s)");
        }
    }

    fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
        self.rewrite_block(items, false);
    }

    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        self.rewrite_block(stmts, false);
    }

    fn visit_mut_var_declarator(&mut self, decl: &mut VarDeclarator) {
        decl.name.visit_mut_with(self);
        let context = match decl.name {
            Pat::Object(_) => RewriteContext::Destructuring,
            _ => RewriteContext::Declarator,
        };
        let subject = binding_subject(&decl.name);
        if let Some(init) = decl.init.as_deref_mut() {
            self.rewrite_or_visit(init, context, subject.as_deref());
        }
    }

    fn visit_mut_call_expr(&mut self, call: &mut CallExpr) {
        match &mut call.callee {
            Callee::Expr(callee) => self.rewrite_or_visit(callee, RewriteContext::Callee, None),
            callee => callee.visit_mut_with(self),
        }
        for arg in &mut call.args {
            self.rewrite_or_visit(&mut arg.expr, RewriteContext::Argument, None);
        }
        call.type_args.visit_mut_with(self);
    }

    fn visit_mut_new_expr(&mut self, new: &mut NewExpr) {
        self.rewrite_or_visit(&mut new.callee, RewriteContext::Constructor, None);
        for arg in new.args.iter_mut().flatten() {
            self.rewrite_or_visit(&mut arg.expr, RewriteContext::Argument, None);
        }
        new.type_args.visit_mut_with(self);
    }

    fn visit_mut_assign_expr(&mut self, assign: &mut AssignExpr) {
        let subject = match &assign.left {
            AssignTarget::Simple(SimpleAssignTarget::Ident(b)) => Some(b.id.sym.to_string()),
            _ => None,
        };
        match &mut assign.left {
            AssignTarget::Simple(SimpleAssignTarget::Member(member)) => self.rewrite_target(member),
            left => left.visit_mut_with(self),
        }
        self.rewrite_or_visit(&mut assign.right, RewriteContext::AssignValue, subject.as_deref());
    }

    fn visit_mut_update_expr(&mut self, update: &mut UpdateExpr) {
        match &mut *update.arg {
            Expr::Member(member) => self.rewrite_target(member),
            arg => arg.visit_mut_with(self),
        }
    }

    fn visit_mut_unary_expr(&mut self, unary: &mut UnaryExpr) {
        match (&unary.op, &mut *unary.arg) {
            (UnaryOp::Delete, Expr::Member(member)) => self.rewrite_target(member),
            (_, arg) => arg.visit_mut_with(self),
        }
    }

    /// Member targets inside destructuring assignments and `for (… of …)` heads.
    fn visit_mut_pat(&mut self, pat: &mut Pat) {
        match pat {
            Pat::Expr(expr) => match &mut **expr {
                Expr::Member(member) => self.rewrite_target(member),
                other => other.visit_mut_with(self),
            },
            _ => pat.visit_mut_children_with(self),
        }
    }

    fn visit_mut_key_value_prop(&mut self, prop: &mut KeyValueProp) {
        prop.key.visit_mut_with(self);
        let subject = prop_key(&prop.key);
        self.rewrite_or_visit(&mut prop.value, RewriteContext::PropertyValue, subject.as_deref());
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        match self.walker.walk(expr) {
            // Only the static part can be imported; the dynamic key stays.
            Some(path) if path.computed => {
                if let Expr::Member(member) = expr {
                    self.rewrite(&mut member.obj, &path, RewriteContext::Expression, None);
                    member.prop.visit_mut_with(self);
                }
            }
            Some(path) => self.rewrite(expr, &path, RewriteContext::Expression, None),
            None => expr.visit_mut_children_with(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{parse, print, Grammar};
    use swc_core::common::{comments::SingleThreadedComments, sync::Lrc, SourceMap};

    fn table() -> ResolutionTable {
        ResolutionTable::from_json(
            r#"{
                "domains": {
                    "domain": { "modules": { "modA": "pkg/modA" } },
                    "ui": { "modules": { "main": null, "status.volume": null } }
                },
                "remaps": { "ui": { "template": "ui/{module}.js" } }
            }"#,
        )
        .unwrap()
    }

    fn rewrite(code: &str) -> (String, Vec<String>) {
        let cm: Lrc<SourceMap> = Default::default();
        let comments = SingleThreadedComments::default();
        let mut module = parse(&cm, "dispatch.js", code, Grammar::Ecma, &comments).unwrap();
        let table = table();
        let mut reporter = Reporter::new(None);
        module.visit_mut_with(&mut ImportRewriter::new(&table, &mut reporter));
        let messages = reporter
            .into_diagnostics()
            .into_iter()
            .map(|d| d.message)
            .collect();
        (print(&cm, &module, &comments).unwrap(), messages)
    }

    fn normalize(code: &str) -> String {
        let cm: Lrc<SourceMap> = Default::default();
        let comments = SingleThreadedComments::default();
        let module = parse(&cm, "expected.js", code, Grammar::Ecma, &comments).unwrap();
        print(&cm, &module, &comments).unwrap()
    }

    #[test]
    fn top_level_const_becomes_the_import() {
        let (out, reports) = rewrite("const Main = imports.ui.main;\nMain.notify(\"hi\");");
        assert!(reports.is_empty());
        assert_eq!(
            out,
            normalize("import * as Main from \"ui/main.js\";\nMain.notify(\"hi\");")
        );
    }

    #[test]
    fn nested_declarations_keep_their_alias() {
        let (out, _) = rewrite("function f() { const Main = imports.ui.main; }");
        assert_eq!(
            out,
            normalize("import * as $ui$main$ from \"ui/main.js\";\nfunction f() { const Main = $ui$main$; }")
        );
    }

    #[test]
    fn var_declarations_keep_their_alias() {
        let (out, _) = rewrite("var x = imports.domain.modA.symbolX;");
        assert_eq!(
            out,
            normalize(
                "import { symbolX as $domain$modA$symbolX$ } from \"pkg/modA\";\nvar x = $domain$modA$symbolX$;"
            )
        );
    }

    #[test]
    fn destructured_properties_become_separate_declarations() {
        let (out, reports) = rewrite("const { a, b: c } = imports.domain.modA;");
        assert!(reports.is_empty());
        assert_eq!(
            out,
            normalize(
                "import { a as $domain$modA$a$ } from \"pkg/modA\";
                 import { b as $domain$modA$b$ } from \"pkg/modA\";
                 const a = $domain$modA$a$;
                 const c = $domain$modA$b$;"
            )
        );
    }

    #[test]
    fn properties_with_defaults_stay_in_the_pattern() {
        let (out, _) = rewrite("const { a, b = 1 } = imports.domain.modA;");
        assert_eq!(
            out,
            normalize(
                "import { a as $domain$modA$a$ } from \"pkg/modA\";
                 import * as $domain$modA$ from \"pkg/modA\";
                 const { b = 1 } = $domain$modA$;
                 const a = $domain$modA$a$;"
            )
        );
    }

    #[test]
    fn callee_keeps_its_receiver() {
        let (out, _) = rewrite("imports.ui.main.notify(\"hi\");");
        assert_eq!(
            out,
            normalize("import * as $ui$main$ from \"ui/main.js\";\n$ui$main$.notify(\"hi\");")
        );
    }

    #[test]
    fn deeper_members_stay_on_the_import() {
        let (out, _) = rewrite("imports.ui.main.panel.statusArea.x = 1;");
        assert_eq!(
            out,
            normalize(
                "import { panel as $ui$main$panel$ } from \"ui/main.js\";\n$ui$main$panel$.statusArea.x = 1;"
            )
        );
    }

    #[test]
    fn assigning_to_an_import_is_reported() {
        let (out, reports) = rewrite("imports.ui.main.notify = f;");
        assert_eq!(out, normalize("imports.ui.main.notify = f;"));
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("is read-only"));
    }

    #[test]
    fn updates_and_deletes_of_an_import_are_reported() {
        let code = "imports.ui.main.counter++;\n--imports.ui.main.counter;\ndelete imports.ui.main.counter;";
        let (out, reports) = rewrite(code);
        assert_eq!(out, normalize(code));
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.contains("would become an import binding")));
    }

    #[test]
    fn updates_below_an_import_are_rewritten() {
        let (out, reports) = rewrite("imports.ui.main.panel.count++;");
        assert!(reports.is_empty());
        assert_eq!(
            out,
            normalize("import { panel as $ui$main$panel$ } from \"ui/main.js\";\n$ui$main$panel$.count++;")
        );
    }

    #[test]
    fn keyed_writes_into_a_module_namespace_are_reported() {
        let (out, reports) = rewrite("imports.ui.main[k] = 1;\nimports.ui.main.panel[k] = 2;");
        assert_eq!(
            out,
            normalize(
                "import { panel as $ui$main$panel$ } from \"ui/main.js\";\nimports.ui.main[k] = 1;\n$ui$main$panel$[k] = 2;"
            )
        );
        assert_eq!(
            reports,
            vec!["unable to resolve `imports.ui.main[…]` (keyed assignment target): `imports.ui.main[…]` would write into a module namespace, which is read-only"]
        );
    }

    #[test]
    fn destructuring_assignment_targets_are_checked() {
        let (out, reports) = rewrite("[imports.ui.main.x, imports.ui.main.panel.y] = pair;");
        assert_eq!(
            out,
            normalize(
                "import { panel as $ui$main$panel$ } from \"ui/main.js\";\n[imports.ui.main.x, $ui$main$panel$.y] = pair;"
            )
        );
        assert_eq!(reports.len(), 1);
    }

    #[test]
    fn unknown_paths_are_reported_and_left_alone() {
        let (out, reports) = rewrite("const Ghost = imports.ghost.thing;\nfoo(1);");
        assert_eq!(out, normalize("const Ghost = imports.ghost.thing;\nfoo(1);"));
        assert_eq!(
            reports,
            vec!["unable to resolve `imports.ghost.thing` for `Ghost`: unknown domain `ghost`"]
        );
    }

    #[test]
    fn one_import_per_minted_name() {
        let (out, _) = rewrite("f(imports.ui.main.panel);\ng(imports.ui.main.panel);\nlet o = { p: imports.ui.main.panel };");
        assert_eq!(out.matches("import {").count(), 1);
        assert_eq!(out.matches("$ui$main$panel$").count(), 4);
    }

    #[test]
    fn existing_imports_are_reused() {
        let code = "import { symbolX as $domain$modA$symbolX$ } from \"pkg/modA\";\nfoo(imports.domain.modA.symbolX);";
        let (out, _) = rewrite(code);
        assert_eq!(
            out,
            normalize("import { symbolX as $domain$modA$symbolX$ } from \"pkg/modA\";\nfoo($domain$modA$symbolX$);")
        );
    }

    #[test]
    fn dynamic_key_on_a_module_keeps_the_key() {
        let (out, _) = rewrite("const w = imports.ui.main[name];");
        assert_eq!(
            out,
            normalize("import * as $ui$main$ from \"ui/main.js\";\nconst w = $ui$main$[name];")
        );
    }
}
