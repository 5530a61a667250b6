//! Rewrites legacy `imports.domain.module.symbol` accesses into ES module
//! imports and promotes top-level declarations to exports.

use log::warn;
use swc_core::{
    common::comments::Comments,
    ecma::{ast::*, visit::VisitMutWith},
    plugin::{plugin_transform, proxies::TransformPluginProgramMetadata},
};

pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod exports;
pub mod minter;
pub mod namespace;
pub mod path;
pub mod resolver;
pub mod source;
pub mod table;

pub use config::{Config, Options, TableSource};
pub use diagnostics::{Diagnostic, Reporter, RewriteContext};
pub use dispatch::ImportRewriter;
pub use exports::{ClassBindingRenamer, ExportNormalizer};
pub use minter::{mint, ImportBook};
pub use namespace::NamespaceCollapser;
pub use path::{DottedPath, PathWalker};
pub use resolver::{resolve, ImportStyle, ResolveError, ResolvedReference};
pub use source::{transform_source, Grammar, Report, TransformError, TransformOutput};
pub use table::{ResolutionTable, TableError};

// -----------------------------------------------------------------------------
// Pipeline
// -----------------------------------------------------------------------------

/// Runs every pass over `module` in order. Resolution failures end up in `reporter`.
pub fn transform_module(
    module: &mut Module,
    table: &ResolutionTable,
    options: &Options,
    reporter: &mut Reporter<'_>,
) {
    // Pass 1: whole-directory accesses become local objects
    module.visit_mut_with(&mut NamespaceCollapser::new(table));

    // Pass 2: legacy accesses become imports
    module.visit_mut_with(&mut ImportRewriter::new(table, reporter));

    if !options.export_declarations {
        return;
    }

    // Pass 3: top-level declarations become exports
    let mut normalizer = ExportNormalizer::default();
    module.visit_mut_with(&mut normalizer);

    // Pass 4: references follow renamed classes
    let renames = normalizer.into_renames();
    if !renames.is_empty() {
        module.visit_mut_with(&mut ClassBindingRenamer::new(renames));
    }
}

fn into_module(program: Program) -> Module {
    match program {
        Program::Module(module) => module,
        Program::Script(script) => Module {
            span: script.span,
            body: script.body.into_iter().map(ModuleItem::Stmt).collect(),
            shebang: script.shebang,
        },
    }
}

// -----------------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------------

#[plugin_transform]
pub fn process_transform(program: Program, metadata: TransformPluginProgramMetadata) -> Program {
    let config: Config = metadata
        .get_transform_plugin_config()
        .map(|s| serde_json::from_str(&s).unwrap_or_default())
        .unwrap_or_default();

    let table = match config.table() {
        Ok(table) => table,
        Err(err) => {
            warn!("imports-esm disabled: {err}");
            return program;
        }
    };

    let mut module = into_module(program);
    let comments = metadata.comments.as_ref().map(|c| c as &dyn Comments);
    let source_map = &metadata.source_map;
    let mut reporter = Reporter::new(comments)
        .annotate(config.options.annotate)
        .on_report(|diagnostic: &Diagnostic| {
            warn!("{}: {}", diagnostic.location(source_map), diagnostic.message);
        });
    transform_module(&mut module, &table, &config.options, &mut reporter);

    Program::Module(module)
}
