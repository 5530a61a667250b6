use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use swc_core::{
    common::{SyntaxContext, DUMMY_SP},
    ecma::ast::*,
};

use crate::table::{ResolutionTable, RootAlias, LEGACY_ROOT};

static IDENT_RE: OnceLock<Regex> = OnceLock::new();

pub(crate) fn is_identifier(s: &str) -> bool {
    IDENT_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid identifier regex"))
        .is_match(s)
}

/// A legacy namespace access such as `imports.ui.main.notify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DottedPath {
    /// Root chain as written in the source: `["imports"]` or `["Me", "imports"]`.
    pub root: Vec<String>,
    /// Domain first. For aliased roots the domain is implicit.
    pub segments: Vec<String>,
    pub implicit_domain: bool,
    /// The access continued with a dynamic computed key.
    pub computed: bool,
}

impl DottedPath {
    /// Segments as they appear after the root in the source.
    pub fn source_segments(&self) -> &[String] {
        if self.implicit_domain {
            &self.segments[1..]
        } else {
            &self.segments
        }
    }

    pub fn child(&self, segment: &str) -> DottedPath {
        let mut child = self.clone();
        child.segments.push(segment.to_string());
        child.computed = false;
        child
    }

    /// Rebuilds the legacy member expression for the static part of the path.
    pub fn to_expr(&self) -> Expr {
        let Some((head, chain)) = self.root.split_first() else {
            return member_chain(ident_expr(LEGACY_ROOT), self.source_segments());
        };
        let segments: Vec<String> = chain.iter().chain(self.source_segments()).cloned().collect();
        member_chain(ident_expr(head), &segments)
    }
}

impl fmt::Display for DottedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.join("."))?;
        for segment in self.source_segments() {
            if is_identifier(segment) {
                write!(f, ".{segment}")?;
            } else {
                write!(f, "[{segment:?}]")?;
            }
        }
        if self.computed {
            write!(f, "[…]")?;
        }
        Ok(())
    }
}

pub(crate) fn ident_expr(name: &str) -> Expr {
    Expr::Ident(Ident::new(name.into(), DUMMY_SP, SyntaxContext::empty()))
}

/// `base.a.b["c-d"]` for `segments = [a, b, c-d]`.
pub(crate) fn member_chain(base: Expr, segments: &[String]) -> Expr {
    segments.iter().fold(base, |obj, segment| {
        let prop = if is_identifier(segment) {
            MemberProp::Ident(IdentName::new(segment.as_str().into(), DUMMY_SP))
        } else {
            MemberProp::Computed(ComputedPropName {
                span: DUMMY_SP,
                expr: Box::new(Expr::Lit(Lit::Str(Str {
                    span: DUMMY_SP,
                    value: segment.as_str().into(),
                    raw: None,
                }))),
            })
        };
        Expr::Member(MemberExpr {
            span: DUMMY_SP,
            obj: Box::new(obj),
            prop,
        })
    })
}

fn static_segment(prop: &MemberProp) -> Option<String> {
    match prop {
        MemberProp::Ident(i) => Some(i.sym.to_string()),
        MemberProp::Computed(c) => match &*c.expr {
            Expr::Lit(Lit::Str(s)) => Some(s.value.to_string()),
            _ => None,
        },
        MemberProp::PrivateName(_) => None,
    }
}

/// Collects legacy member chains out of expressions.
pub struct PathWalker<'a> {
    roots: &'a [RootAlias],
}

impl<'a> PathWalker<'a> {
    pub fn new(table: &'a ResolutionTable) -> Self {
        Self {
            roots: table.roots(),
        }
    }

    /// The legacy path `expr` reads, flagging a trailing dynamic key.
    pub fn walk(&self, expr: &Expr) -> Option<DottedPath> {
        match expr {
            Expr::Member(member) => self.walk_member(member),
            _ => None,
        }
    }

    pub fn walk_member(&self, member: &MemberExpr) -> Option<DottedPath> {
        // Collected leaf first, then reversed into root-to-leaf order.
        let mut chain = Vec::new();
        let computed = match &member.prop {
            MemberProp::Computed(c) if !matches!(&*c.expr, Expr::Lit(Lit::Str(_))) => true,
            prop => {
                chain.push(static_segment(prop)?);
                false
            }
        };
        let mut cursor = &*member.obj;
        loop {
            match cursor {
                Expr::Member(m) => {
                    chain.push(static_segment(&m.prop)?);
                    cursor = &m.obj;
                }
                Expr::Ident(root) => {
                    chain.push(root.sym.to_string());
                    break;
                }
                _ => return None,
            }
        }
        chain.reverse();

        self.classify(chain, computed)
    }

    /// Like [`PathWalker::walk`] but only for fully static chains.
    pub fn walk_static(&self, expr: &Expr) -> Option<DottedPath> {
        self.walk(expr).filter(|path| !path.computed)
    }
    fn classify(&self, chain: Vec<String>, computed: bool) -> Option<DottedPath> {
        let alias = self
            .roots
            .iter()
            .find(|r| chain.len() > r.chain.len() && chain.starts_with(&r.chain))?;
        let rest = &chain[alias.chain.len()..];
        let segments = match &alias.domain {
            Some(domain) => std::iter::once(domain.clone()).chain(rest.iter().cloned()).collect(),
            None => rest.to_vec(),
        };
        Some(DottedPath {
            root: alias.chain.clone(),
            segments,
            implicit_domain: alias.domain.is_some(),
            computed,
        })
    }
}
