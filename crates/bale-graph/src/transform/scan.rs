//! Import scanner built on `oxc_parser`.
//!
//! Collects string specifiers from `import`, `export ... from`, `require("...")`
//! and `import("...")` without rewriting the code. JSON files are turned into
//! a CommonJS module so they can be required.

use async_trait::async_trait;
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_span::SourceType;

use super::{SourceFile, TransformError, TransformOutput, TransformResult, Transformer};

/// Transformer that only discovers imports.
#[derive(Debug, Clone, Default)]
pub struct ImportScanner {
    /// Also collect `require` calls whose argument is a template literal without expressions.
    pub templates: bool,
}

impl ImportScanner {
    pub const NAME: &'static str = "scan";

    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transformer for ImportScanner {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn transform(&self, file: SourceFile<'_>) -> TransformResult {
        let extension = file
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        if extension == "json" {
            return Ok(Some(TransformOutput {
                contents: format!("module.exports = {};", file.contents.trim_end()),
                source_map: None,
                imports: Vec::new(),
            }));
        }

        let source_type = match extension {
            "cjs" => SourceType::cjs(),
            "js" | "mjs" | "jsx" | "ts" | "mts" | "cts" | "tsx" => {
                SourceType::from_path(file.path).unwrap_or(SourceType::mjs())
            }
            _ => return Ok(None),
        };

        let imports = scan_imports(file.contents, source_type, self.templates)?;
        Ok(Some(TransformOutput {
            contents: file.contents.to_string(),
            source_map: None,
            imports,
        }))
    }
}

/// Parse `source` and return every static import specifier in source order.
pub fn scan_imports(
    source: &str,
    source_type: SourceType,
    templates: bool,
) -> Result<Vec<String>, TransformError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type).parse();

    if ret.panicked || !ret.errors.is_empty() {
        let message = ret
            .errors
            .first()
            .map(|err| err.to_string())
            .unwrap_or_else(|| "parser panicked".to_string());
        return Err(TransformError::new(message));
    }

    let mut collector = SpecifierCollector {
        templates,
        specifiers: Vec::new(),
    };
    walk::walk_program(&mut collector, &ret.program);
    Ok(collector.specifiers)
}

struct SpecifierCollector {
    templates: bool,
    specifiers: Vec<String>,
}

impl SpecifierCollector {
    fn push(&mut self, specifier: &str) {
        if !self.specifiers.iter().any(|s| s == specifier) {
            self.specifiers.push(specifier.to_string());
        }
    }
}

impl<'a> Visit<'a> for SpecifierCollector {
    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        self.push(decl.source.value.as_str());
    }

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &decl.source {
            self.push(source.value.as_str());
        }
        walk::walk_export_named_declaration(self, decl);
    }

    fn visit_export_all_declaration(&mut self, decl: &ExportAllDeclaration<'a>) {
        self.push(decl.source.value.as_str());
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &expr.source {
            self.push(lit.value.as_str());
        }
        walk::walk_import_expression(self, expr);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Expression::Identifier(ident) = &call.callee {
            if ident.name.as_str() == "require" && call.arguments.len() == 1 {
                match &call.arguments[0] {
                    Argument::StringLiteral(lit) => self.push(lit.value.as_str()),
                    Argument::TemplateLiteral(tpl)
                        if self.templates && tpl.expressions.is_empty() =>
                    {
                        if let Some(quasi) = tpl.quasis.first() {
                            self.push(quasi.value.raw.as_str());
                        }
                    }
                    _ => {}
                }
            }
        }
        walk::walk_call_expression(self, call);
    }
}
