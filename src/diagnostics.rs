use swc_core::common::{
    comments::{Comment, CommentKind, Comments},
    SourceMapper, Span, DUMMY_SP,
};

use crate::path::DottedPath;
use crate::resolver::ResolveError;

/// Normalize host-style filenames (`file://`, bundler prefixes) for reports.
fn normalize_filename(filename: &str) -> String {
    let s = filename.replace('\\', "/");
    if let Some(rest) = s.strip_prefix("file:///") {
        return format!("/{rest}");
    }
    if let Some(rest) = s.strip_prefix("file://") {
        return rest.to_string();
    }
    s
}

/// Syntactic role of a legacy access, as named in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteContext {
    Declarator,
    Destructuring,
    PropertyValue,
    Argument,
    Callee,
    Constructor,
    AssignTarget,
    /// `imports.x.y[key] = ...`, `delete imports.x.y[key]`.
    KeyedTarget,
    AssignValue,
    Expression,
}

impl RewriteContext {
    fn describe(self) -> &'static str {
        match self {
            RewriteContext::Declarator => "declaration",
            RewriteContext::Destructuring => "destructuring",
            RewriteContext::PropertyValue => "property value",
            RewriteContext::Argument => "call argument",
            RewriteContext::Callee => "callee",
            RewriteContext::Constructor => "constructor",
            RewriteContext::AssignTarget => "assignment target",
            RewriteContext::KeyedTarget => "keyed assignment target",
            RewriteContext::AssignValue => "assigned value",
            RewriteContext::Expression => "expression",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    /// `file:line:col` of the offending node.
    pub fn location(&self, cm: &dyn SourceMapper) -> String {
        if self.span.is_dummy() {
            return "unknown:0:0".to_string();
        }
        let lo = cm.lookup_char_pos(self.span.lo());
        format!(
            "{}:{}:{}",
            normalize_filename(&lo.file.name.to_string()),
            lo.line,
            lo.col_display + 1
        )
    }
}

/// Collects resolution failures, annotating the tree as it goes.
pub struct Reporter<'a> {
    comments: Option<&'a dyn Comments>,
    annotate: bool,
    diagnostics: Vec<Diagnostic>,
    listener: Option<Box<dyn FnMut(&Diagnostic) + 'a>>,
}

impl<'a> Reporter<'a> {
    pub fn new(comments: Option<&'a dyn Comments>) -> Self {
        Self {
            comments,
            annotate: true,
            diagnostics: vec![],
            listener: None,
        }
    }

    /// Whether failures get an inline comment in the output.
    pub fn annotate(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    /// Called with every diagnostic as soon as it is reported.
    pub fn on_report(mut self, listener: impl FnMut(&Diagnostic) + 'a) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn report(
        &mut self,
        span: Span,
        path: &DottedPath,
        context: RewriteContext,
        subject: Option<&str>,
        error: &ResolveError,
    ) {
        let message = match subject {
            Some(subject) => format!("unable to resolve `{path}` for `{subject}`: {error}"),
            None => format!(
                "unable to resolve `{path}` ({}): {error}",
                context.describe()
            ),
        };
        self.attach_comment(span, &format!(" codemod: {message} "));

        let diagnostic = Diagnostic { message, span };
        if let Some(listener) = self.listener.as_mut() {
            listener(&diagnostic);
        }
        self.diagnostics.push(diagnostic);
    }

    /// Leaves a `TODO(codemod)` breadcrumb on a rewrite that succeeded.
    pub fn note(&self, span: Span, note: &str) {
        self.attach_comment(span, &format!(" TODO(codemod): {note} "));
    }

    fn attach_comment(&self, span: Span, text: &str) {
        let Some(comments) = self.comments.filter(|_| self.annotate) else {
            return;
        };
        if span.is_dummy() {
            return;
        }
        let already = comments
            .get_leading(span.lo())
            .is_some_and(|existing| existing.iter().any(|c| &*c.text == text));
        if !already {
            comments.add_leading(
                span.lo(),
                Comment {
                    kind: CommentKind::Block,
                    span: DUMMY_SP,
                    text: text.to_string().into(),
                },
            );
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
