/// TypeScript Transpiler
///
/// Turns challenge solutions written in TypeScript into plain ES2020
/// script code for the sandbox. Type syntax is stripped with swc; the
/// first parser diagnostic aborts with a `Compile` error and no code.
///
/// Diagnostics are syntactic only. No type checker runs here, so a
/// well-formed program with a type mismatch still transpiles.
///
/// Nothing is executed during transpilation.

use dojo_common::types::ExecutionError;
use swc_core::common::{
    comments::SingleThreadedComments, sync::Lrc, BytePos, FileName, Globals, Mark, SourceMap,
    Spanned, GLOBALS,
};
use swc_core::ecma::ast::{EsVersion, ModuleDecl, ModuleItem, NamedExport, Program};
use swc_core::ecma::codegen::{text_writer::JsWriter, Config as CodegenConfig, Emitter};
use swc_core::ecma::parser::{lexer::Lexer, Parser, StringInput, Syntax, TsSyntax};
use swc_core::ecma::transforms::base::{fixer::fixer, hygiene::hygiene, resolver};
use swc_core::ecma::transforms::typescript::strip;

/// Language edition of the emitted code
pub const TARGET: EsVersion = EsVersion::Es2020;

const SOURCE_NAME: &str = "solution.ts";

/// Transpile TypeScript source into executable JavaScript
pub fn transpile(source: &str) -> Result<String, ExecutionError> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(
        FileName::Custom(SOURCE_NAME.to_string()).into(),
        source.to_string(),
    );
    let comments = SingleThreadedComments::default();

    let lexer = Lexer::new(
        Syntax::Typescript(TsSyntax::default()),
        TARGET,
        StringInput::from(&*fm),
        Some(&comments),
    );
    let mut parser = Parser::new_from(lexer);

    // Parsed as a module so top-level await is accepted; module syntax is
    // rejected after type-only imports have been stripped.
    let parsed = parser.parse_module();
    let mut errors = parser.take_errors();
    let module = match parsed {
        Ok(module) => module,
        Err(fatal) => {
            errors.push(fatal);
            return Err(first_diagnostic(&cm, errors));
        }
    };
    if !errors.is_empty() {
        return Err(first_diagnostic(&cm, errors));
    }

    let globals = Globals::default();
    GLOBALS.set(&globals, || {
        let unresolved_mark = Mark::new();
        let top_level_mark = Mark::new();

        let mut program = Program::Module(module)
            .apply(resolver(unresolved_mark, top_level_mark, true))
            .apply(strip(unresolved_mark, top_level_mark))
            .apply(hygiene())
            .apply(fixer(Some(&comments)));

        // strip leaves `export {}` behind once type-only imports are gone
        if let Program::Module(module) = &mut program {
            module.body.retain(|item| !is_empty_export(item));
        }

        reject_module_syntax(&cm, &program)?;
        emit(&cm, &program)
    })
}

fn first_diagnostic(
    cm: &SourceMap,
    errors: Vec<swc_core::ecma::parser::error::Error>,
) -> ExecutionError {
    match errors.into_iter().min_by_key(|e| e.span().lo) {
        Some(err) => compile_error(cm, err.span().lo, &err.kind().msg()),
        None => ExecutionError::Compile("Compilation failed".to_string()),
    }
}

fn compile_error(cm: &SourceMap, pos: BytePos, message: &str) -> ExecutionError {
    let loc = cm.lookup_char_pos(pos);
    ExecutionError::Compile(format!("({}:{}) {}", loc.line, loc.col.0 + 1, message))
}

fn is_empty_export(item: &ModuleItem) -> bool {
    matches!(
        item,
        ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(NamedExport { specifiers, src: None, .. }))
            if specifiers.is_empty()
    )
}

fn reject_module_syntax(cm: &SourceMap, program: &Program) -> Result<(), ExecutionError> {
    let Program::Module(module) = program else {
        return Ok(());
    };

    for item in &module.body {
        if let ModuleItem::ModuleDecl(decl) = item {
            return Err(compile_error(
                cm,
                decl.span().lo,
                "import and export statements are not supported; solutions run as standalone scripts",
            ));
        }
    }
    Ok(())
}

fn emit(cm: &Lrc<SourceMap>, program: &Program) -> Result<String, ExecutionError> {
    let mut buf = Vec::new();
    {
        let mut emitter = Emitter {
            cfg: CodegenConfig::default().with_target(TARGET),
            cm: cm.clone(),
            comments: None,
            wr: JsWriter::new(cm.clone(), "\n", &mut buf, None),
        };
        emitter
            .emit_program(program)
            .map_err(|e| ExecutionError::Compile(format!("Failed to emit JavaScript: {}", e)))?;
    }

    String::from_utf8(buf)
        .map_err(|e| ExecutionError::Compile(format!("Emitted code is not valid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_message(result: Result<String, ExecutionError>) -> String {
        match result {
            Err(ExecutionError::Compile(msg)) => msg,
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_strips_type_annotations() {
        let js = transpile("const x: number = 41;\nconsole.log(x + 1);").unwrap();
        assert!(js.contains("const x = 41"));
        assert!(!js.contains(": number"));
        assert!(js.contains("console.log(x + 1)"));
    }

    #[test]
    fn test_type_errors_are_not_reported() {
        let js = transpile("const x: number = \"a\";\nconsole.log(x);").unwrap();
        assert!(js.contains("const x = \"a\""));
        assert!(js.contains("console.log(x)"));
    }

    #[test]
    fn test_removes_interfaces_and_type_aliases() {
        let source = r#"
interface Point { x: number; y: number }
type Pair = [number, number];
function norm(p: Point): number { return Math.abs(p.x) + Math.abs(p.y); }
const pair: Pair = [1, 2];
console.log(norm({ x: pair[0], y: -pair[1] }));
"#;
        let js = transpile(source).unwrap();
        assert!(!js.contains("interface"));
        assert!(!js.contains("type Pair"));
        assert!(js.contains("function norm(p)"));
    }

    #[test]
    fn test_enums_are_lowered() {
        let js = transpile("enum Color { Red, Green }\nconsole.log(Color.Green);").unwrap();
        assert!(!js.contains("enum Color"));
        assert!(js.contains("Color"));
    }

    #[test]
    fn test_top_level_await_is_accepted() {
        let js = transpile("await Promise.resolve(1);\nconsole.log('done');").unwrap();
        assert!(js.contains("await Promise.resolve(1)"));
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let msg = compile_message(transpile("const a = ;\nconsole.log(a);"));
        assert!(msg.starts_with("(1:"), "unexpected message: {}", msg);
    }

    #[test]
    fn test_reports_first_error_only() {
        let msg = compile_message(transpile("const = 1;\nconst = 2;"));
        assert!(msg.starts_with("(1:"), "unexpected message: {}", msg);
        assert!(!msg.contains('\n'));
    }

    #[test]
    fn test_imports_are_rejected() {
        let msg = compile_message(transpile("import fs from 'fs';\nconsole.log(fs);"));
        assert!(msg.contains("not supported"));
    }

    #[test]
    fn test_type_only_imports_are_stripped() {
        let js = transpile("import type { Foo } from './foo';\nconst n: number = 1;\nconsole.log(n);").unwrap();
        assert!(!js.contains("import"));
    }

    #[test]
    fn test_warnings_do_not_block() {
        // Unused declarations and implicit any are not errors
        let js = transpile("function f(a) { const unused = 1; return a; }\nconsole.log(f(2));").unwrap();
        assert!(js.contains("function f(a)"));
    }
}
