//! Text in, text out: the parser and printer around the passes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use swc_core::{
    common::{
        comments::{Comments, SingleThreadedComments},
        sync::Lrc,
        FileName, Globals, SourceMap, Spanned, GLOBALS,
    },
    ecma::{
        ast::{EsVersion, Module},
        codegen::{text_writer::JsWriter, Config as CodegenConfig, Emitter},
        parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax},
    },
};

use crate::config::Options;
use crate::diagnostics::Reporter;
use crate::table::{ResolutionTable, TableError};
use crate::transform_module;

/// Grammar the input is parsed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Grammar {
    /// Legacy GJS scripts: top-level `return` is tolerated.
    #[default]
    Gjs,
    Ecma,
    Typescript,
}

impl Grammar {
    fn syntax(self) -> Syntax {
        match self {
            Grammar::Gjs => Syntax::Es(EsSyntax {
                allow_return_outside_function: true,
                ..Default::default()
            }),
            Grammar::Ecma => Syntax::Es(Default::default()),
            Grammar::Typescript => Syntax::Typescript(TsSyntax::default()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("{location}: {message}")]
    Parse { message: String, location: String },
    #[error("failed to emit code: {0}")]
    Emit(#[from] std::io::Error),
    #[error("emitted code is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Table(#[from] TableError),
}

/// One surfaced diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub message: String,
    pub location: String,
}

#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub code: String,
    pub reports: Vec<Report>,
}

pub fn parse(
    cm: &Lrc<SourceMap>,
    name: &str,
    source: &str,
    grammar: Grammar,
    comments: &SingleThreadedComments,
) -> Result<Module, TransformError> {
    let file = cm.new_source_file(FileName::Real(PathBuf::from(name)).into(), source.to_string());
    let lexer = Lexer::new(
        grammar.syntax(),
        EsVersion::Es2022,
        StringInput::from(&*file),
        Some(comments as &dyn Comments),
    );
    let mut parser = Parser::new_from(lexer);
    let parse_error = |err: swc_core::ecma::parser::error::Error| {
        let lo = cm.lookup_char_pos(err.span().lo());
        TransformError::Parse {
            message: err.kind().msg().to_string(),
            location: format!("{name}:{}:{}", lo.line, lo.col_display + 1),
        }
    };
    let module = parser.parse_module().map_err(parse_error)?;
    if let Some(err) = parser.take_errors().into_iter().next() {
        return Err(parse_error(err));
    }
    Ok(module)
}

pub fn print(
    cm: &Lrc<SourceMap>,
    module: &Module,
    comments: &SingleThreadedComments,
) -> Result<String, TransformError> {
    let mut buf = Vec::new();
    {
        let mut emitter = Emitter {
            cfg: CodegenConfig::default(),
            cm: cm.clone(),
            comments: Some(comments as &dyn Comments),
            wr: JsWriter::new(cm.clone(), "\n", &mut buf, None),
        };
        emitter.emit_module(module)?;
    }
    Ok(String::from_utf8(buf)?)
}

/// Parses `source`, runs every pass and prints the result.
pub fn transform_source(
    name: &str,
    source: &str,
    grammar: Grammar,
    table: &ResolutionTable,
    options: &Options,
) -> Result<TransformOutput, TransformError> {
    GLOBALS.set(&Globals::new(), || {
        let cm: Lrc<SourceMap> = Default::default();
        let comments = SingleThreadedComments::default();
        let mut module = parse(&cm, name, source, grammar, &comments)?;

        let diagnostics = {
            let mut reporter =
                Reporter::new(Some(&comments as &dyn Comments)).annotate(options.annotate);
            transform_module(&mut module, table, options, &mut reporter);
            reporter.into_diagnostics()
        };

        let code = print(&cm, &module, &comments)?;
        let reports = diagnostics
            .into_iter()
            .map(|d| Report {
                location: d.location(&*cm),
                message: d.message,
            })
            .collect();
        Ok(TransformOutput { code, reports })
    })
}
