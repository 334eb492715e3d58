//! Type erasure over the parsed tree
//!
//! TypeScript-only syntax is overwritten with spaces in a copy of the
//! source, so every surviving token keeps its line and column. Declarations
//! without runtime meaning become empty statements. Constructs that cannot be
//! erased this way are reported as unsupported.

use oxc_ast::ast::*;
use oxc_ast_visit::{Visit, walk};
use oxc_span::{GetSpan, Span};
use oxc_syntax::scope::ScopeFlags;

use crate::compiler::{CompileError, Position};

/// Modifier keywords with no runtime meaning on class members and parameters
const MEMBER_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "readonly", "override", "declare", "abstract",
];

enum Edit {
    /// Overwrite with spaces, keeping line breaks
    Blank(Span),
    /// Overwrite with an empty statement
    Empty(Span),
    Insert { at: u32, text: String },
}

/// Erase type-level syntax from `program`, which was parsed from `source`
pub(crate) fn erase(program: &Program<'_>, source: &str) -> Result<String, CompileError> {
    let mut eraser = Eraser {
        source,
        edits: Vec::new(),
        unsupported: None,
        derived: Vec::new(),
    };
    eraser.visit_program(program);
    if let Some((construct, offset)) = eraser.unsupported {
        return Err(CompileError::Unsupported {
            construct,
            pos: Position::at(source, offset as usize),
        });
    }
    Ok(eraser.apply())
}

struct Eraser<'s> {
    source: &'s str,
    edits: Vec<Edit>,
    /// First construct that cannot run, with its offset
    unsupported: Option<(String, u32)>,
    /// Per enclosing class: whether it has a superclass
    derived: Vec<bool>,
}

impl Eraser<'_> {
    fn blank(&mut self, span: Span) {
        if span.start < span.end {
            self.edits.push(Edit::Blank(span));
        }
    }

    fn empty(&mut self, span: Span) {
        self.edits.push(Edit::Empty(span));
    }

    fn reject(&mut self, construct: &str, span: Span) {
        if self.unsupported.is_none() {
            self.unsupported = Some((construct.to_string(), span.start));
        }
    }

    /// Blank any of `words` that appear as whole words in `start..end`
    fn blank_words(&mut self, start: u32, end: u32, words: &[&str]) {
        let bytes = self.source.as_bytes();
        let end = (end as usize).min(bytes.len());
        let mut i = start as usize;
        while i < end {
            if !is_ident_byte(bytes[i]) {
                i += 1;
                continue;
            }
            let word_start = i;
            while i < end && is_ident_byte(bytes[i]) {
                i += 1;
            }
            if words.contains(&&self.source[word_start..i]) {
                self.blank(Span::new(word_start as u32, i as u32));
            }
        }
    }

    /// Blank `keyword` if it is the next token at `at`; returns where it ends
    fn blank_keyword(&mut self, at: u32, keyword: &str) -> Option<u32> {
        let rest = self.source.get(at as usize..)?;
        let skipped = rest.len() - rest.trim_start().len();
        let found = rest[skipped..].strip_prefix(keyword)?;
        if found.bytes().next().is_some_and(is_ident_byte) {
            return None;
        }
        let start = at + skipped as u32;
        let end = start + keyword.len() as u32;
        self.blank(Span::new(start, end));
        Some(end)
    }

    /// Blank the next character after `from` if it is one of `markers`
    ///
    /// Whitespace and the `]` of a computed key may come first.
    fn blank_marker(&mut self, from: u32, markers: &[char]) {
        let Some(rest) = self.source.get(from as usize..) else {
            return;
        };
        let tail = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ']');
        if tail.chars().next().is_some_and(|c| markers.contains(&c)) {
            let at = from + (rest.len() - tail.len()) as u32;
            self.blank(Span::new(at, at + 1));
        }
    }

    /// Constructor parameter properties become assignments in the body
    fn assign_parameter_properties(&mut self, constructor: &Function<'_>) {
        let names: Vec<String> = constructor
            .params
            .items
            .iter()
            .filter(|param| param.accessibility.is_some() || param.readonly || param.r#override)
            .filter_map(|param| param.pattern.get_binding_identifier())
            .map(|id| id.name.to_string())
            .collect();
        let Some(body) = &constructor.body else {
            return;
        };
        if names.is_empty() {
            return;
        }

        let after_super = self.derived.last().copied().unwrap_or(false).then(|| {
            body.statements.iter().find_map(|statement| match statement {
                Statement::ExpressionStatement(s) if is_super_call(&s.expression) => Some(s.span.end),
                _ => None,
            })
        });
        let at = after_super.flatten().unwrap_or(body.span.start + 1);
        let text = names.iter().map(|name| format!(" this.{name} = {name};")).collect::<String>();
        self.edits.push(Edit::Insert {
            at,
            text: format!(";{text}"),
        });
    }

    fn apply(self) -> String {
        let mut bytes = self.source.as_bytes().to_vec();
        let mut statements = Vec::new();
        let mut inserts = Vec::new();
        for edit in self.edits {
            match edit {
                Edit::Blank(span) => blank_bytes(&mut bytes, span),
                Edit::Empty(span) => {
                    blank_bytes(&mut bytes, span);
                    statements.push(span.start as usize);
                }
                Edit::Insert { at, text } => inserts.push((at as usize, text)),
            }
        }
        for at in statements {
            if let Some(byte) = bytes.get_mut(at) {
                *byte = b';';
            }
        }

        let mut script = String::from_utf8_lossy(&bytes).into_owned();
        inserts.sort_by(|a, b| b.0.cmp(&a.0));
        for (at, text) in inserts {
            if script.is_char_boundary(at) {
                script.insert_str(at, &text);
            }
        }
        script
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_super_call(expression: &Expression<'_>) -> bool {
    matches!(expression, Expression::CallExpression(call) if matches!(call.callee, Expression::Super(_)))
}

/// Spaces over `span`, keeping line breaks so positions stay put
fn blank_bytes(bytes: &mut [u8], span: Span) {
    let end = (span.end as usize).min(bytes.len());
    for byte in bytes.iter_mut().take(end).skip(span.start as usize) {
        if *byte != b'\n' && *byte != b'\r' {
            *byte = b' ';
        }
    }
}

impl<'a> Visit<'a> for Eraser<'_> {
    fn visit_ts_type_annotation(&mut self, it: &TSTypeAnnotation<'a>) {
        self.blank(it.span);
    }

    fn visit_ts_type_parameter_declaration(&mut self, it: &TSTypeParameterDeclaration<'a>) {
        self.blank(it.span);
    }

    fn visit_ts_type_parameter_instantiation(&mut self, it: &TSTypeParameterInstantiation<'a>) {
        self.blank(it.span);
    }

    fn visit_ts_as_expression(&mut self, it: &TSAsExpression<'a>) {
        self.blank(Span::new(it.expression.span().end, it.span.end));
        self.visit_expression(&it.expression);
    }

    fn visit_ts_satisfies_expression(&mut self, it: &TSSatisfiesExpression<'a>) {
        self.blank(Span::new(it.expression.span().end, it.span.end));
        self.visit_expression(&it.expression);
    }

    fn visit_ts_non_null_expression(&mut self, it: &TSNonNullExpression<'a>) {
        self.blank(Span::new(it.expression.span().end, it.span.end));
        self.visit_expression(&it.expression);
    }

    fn visit_ts_type_assertion(&mut self, it: &TSTypeAssertion<'a>) {
        self.blank(Span::new(it.span.start, it.expression.span().start));
        self.visit_expression(&it.expression);
    }

    fn visit_ts_this_parameter(&mut self, it: &TSThisParameter<'a>) {
        self.blank(it.span);
        self.blank_marker(it.span.end, &[',']);
    }

    fn visit_ts_index_signature(&mut self, it: &TSIndexSignature<'a>) {
        self.blank(it.span);
    }

    fn visit_ts_class_implements(&mut self, _it: &TSClassImplements<'a>) {}

    fn visit_decorator(&mut self, it: &Decorator<'a>) {
        self.reject("decorators", it.span);
    }

    fn visit_accessor_property(&mut self, it: &AccessorProperty<'a>) {
        self.reject("accessor fields", it.span);
    }

    fn visit_ts_enum_declaration(&mut self, it: &TSEnumDeclaration<'a>) {
        self.reject("enum", it.span);
    }

    fn visit_ts_module_declaration(&mut self, it: &TSModuleDeclaration<'a>) {
        self.reject("namespace", it.span);
    }

    fn visit_import_declaration(&mut self, it: &ImportDeclaration<'a>) {
        if it.import_kind.is_type() {
            self.empty(it.span);
        } else {
            self.reject("import", it.span);
        }
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        self.reject("import()", it.span);
    }

    fn visit_export_all_declaration(&mut self, it: &ExportAllDeclaration<'a>) {
        if it.export_kind.is_type() {
            self.empty(it.span);
        } else {
            self.reject("export * from", it.span);
        }
    }

    fn visit_ts_export_assignment(&mut self, it: &TSExportAssignment<'a>) {
        self.reject("export =", it.span);
    }

    fn visit_ts_namespace_export_declaration(&mut self, it: &TSNamespaceExportDeclaration<'a>) {
        self.empty(it.span);
    }

    fn visit_await_expression(&mut self, it: &AwaitExpression<'a>) {
        self.reject("await", it.span);
    }

    fn visit_for_of_statement(&mut self, it: &ForOfStatement<'a>) {
        if it.r#await {
            self.reject("for await", it.span);
        } else {
            walk::walk_for_of_statement(self, it);
        }
    }

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if it.export_kind.is_type() {
            self.empty(it.span);
            return;
        }
        match &it.declaration {
            Some(declaration) => {
                self.blank_keyword(it.span.start, "export");
                self.visit_declaration(declaration);
            }
            None if it.source.is_some() => self.reject("export ... from", it.span),
            // `export { a, b }` only lists names
            None => self.empty(it.span),
        }
    }

    fn visit_export_default_declaration(&mut self, it: &ExportDefaultDeclaration<'a>) {
        match &it.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(function) if function.id.is_some() => {
                if let Some(end) = self.blank_keyword(it.span.start, "export") {
                    self.blank_keyword(end, "default");
                }
                if function.body.is_none() {
                    self.empty(function.span);
                } else {
                    self.visit_function(function, ScopeFlags::Function);
                }
            }
            ExportDefaultDeclarationKind::ClassDeclaration(class) if class.id.is_some() => {
                if let Some(end) = self.blank_keyword(it.span.start, "export") {
                    self.blank_keyword(end, "default");
                }
                self.visit_class(class);
            }
            ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => self.empty(it.span),
            _ => self.reject("export default of an expression", it.span),
        }
    }

    fn visit_declaration(&mut self, it: &Declaration<'a>) {
        match it {
            Declaration::VariableDeclaration(d) if d.declare => self.empty(d.span),
            Declaration::FunctionDeclaration(f) if f.declare || f.body.is_none() => self.empty(f.span),
            Declaration::ClassDeclaration(c) if c.declare => self.empty(c.span),
            Declaration::TSTypeAliasDeclaration(d) => self.empty(d.span),
            Declaration::TSInterfaceDeclaration(d) => self.empty(d.span),
            Declaration::TSEnumDeclaration(d) if d.declare => self.empty(d.span),
            Declaration::TSModuleDeclaration(d) if d.declare => self.empty(d.span),
            Declaration::TSGlobalDeclaration(d) => self.empty(d.span),
            Declaration::TSImportEqualsDeclaration(d) if d.import_kind.is_type() => self.empty(d.span),
            Declaration::TSImportEqualsDeclaration(d) => self.reject("import", d.span),
            _ => walk::walk_declaration(self, it),
        }
    }

    fn visit_variable_declarator(&mut self, it: &VariableDeclarator<'a>) {
        if it.definite {
            self.blank_marker(it.id.span().end, &['!']);
        }
        walk::walk_variable_declarator(self, it);
    }

    fn visit_function(&mut self, it: &Function<'a>, flags: ScopeFlags) {
        if it.r#async {
            self.reject("async functions", it.span);
            return;
        }
        walk::walk_function(self, it, flags);
    }

    fn visit_arrow_function_expression(&mut self, it: &ArrowFunctionExpression<'a>) {
        if it.r#async {
            self.reject("async arrow functions", it.span);
            return;
        }
        walk::walk_arrow_function_expression(self, it);
    }

    fn visit_formal_parameter(&mut self, it: &FormalParameter<'a>) {
        if it.accessibility.is_some() || it.readonly || it.r#override {
            self.blank_words(it.span.start, it.pattern.span().start, MEMBER_MODIFIERS);
        }
        if it.optional {
            self.blank_marker(it.pattern.span().end, &['?']);
        }
        walk::walk_formal_parameter(self, it);
    }

    fn visit_class(&mut self, it: &Class<'a>) {
        if it.r#abstract {
            let head_end = it.id.as_ref().map_or(it.body.span.start, |id| id.span.start);
            self.blank_words(it.span.start, head_end, &["abstract"]);
        }
        if let Some(last) = it.implements.last() {
            let heritage_start = [
                it.id.as_ref().map(|id| id.span.end),
                it.type_parameters.as_ref().map(|p| p.span.end),
                it.super_class.as_ref().map(|s| s.span().end),
                it.super_type_arguments.as_ref().map(|a| a.span.end),
            ]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(it.span.start);
            let clause = self.source.get(heritage_start as usize..last.span.end as usize).unwrap_or("");
            if let Some(offset) = clause.find("implements") {
                self.blank(Span::new(heritage_start + offset as u32, last.span.end));
            }
        }

        self.derived.push(it.super_class.is_some());
        walk::walk_class(self, it);
        self.derived.pop();
    }

    fn visit_property_definition(&mut self, it: &PropertyDefinition<'a>) {
        if it.declare || matches!(it.r#type, PropertyDefinitionType::TSAbstractPropertyDefinition) {
            self.empty(it.span);
            return;
        }
        let key = it.key.span();
        self.blank_words(it.span.start, key.start, MEMBER_MODIFIERS);
        if it.optional || it.definite {
            self.blank_marker(key.end, &['?', '!']);
        }
        walk::walk_property_definition(self, it);
    }

    fn visit_method_definition(&mut self, it: &MethodDefinition<'a>) {
        if matches!(it.r#type, MethodDefinitionType::TSAbstractMethodDefinition) || it.value.body.is_none() {
            self.empty(it.span);
            return;
        }
        let key = it.key.span();
        self.blank_words(it.span.start, key.start, MEMBER_MODIFIERS);
        if it.optional {
            self.blank_marker(key.end, &['?']);
        }
        if it.kind == MethodDefinitionKind::Constructor {
            self.assign_parameter_properties(&it.value);
        }
        walk::walk_method_definition(self, it);
    }
}

#[cfg(test)]
mod tests {
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    use super::*;

    fn erased(source: &str) -> Result<String, CompileError> {
        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source, SourceType::ts()).parse();
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        erase(&parsed.program, source)
    }

    /// Erased text with runs of whitespace collapsed
    fn squeezed(source: &str) -> String {
        erased(source).unwrap().split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn annotations_and_generics_become_spaces() {
        let source = "function first<T>(xs: T[], n?: number): T | undefined {\n  return xs[n ?? 0]!;\n}";
        let script = erased(source).unwrap();
        assert_eq!(script.len(), source.len());
        assert_eq!(script.lines().count(), 3);
        assert_eq!(
            script.split_whitespace().collect::<Vec<_>>().join(" "),
            "function first (xs , n ) { return xs[n ?? 0] ; }"
        );
    }

    #[test]
    fn casts_and_assertions_are_dropped() {
        assert_eq!(
            squeezed("const a = (b as unknown as number[]).length satisfies number;"),
            "const a = (b ).length ;"
        );
        assert_eq!(squeezed("const c = <number>d + 1;"), "const c = d + 1;");
    }

    #[test]
    fn type_only_declarations_become_empty_statements() {
        let source = "type Pair = [number, number];\ninterface Node { next?: Node }\ndeclare const LIMIT: number;\nexport type { Pair as P };\nimport type { X } from './x';\nfunction f() {}";
        let script = erased(source).unwrap();
        assert_eq!(script.lines().count(), 6);
        assert_eq!(script.split_whitespace().collect::<Vec<_>>().join(" "), "; ; ; ; ; function f() {}");
    }

    #[test]
    fn overloads_keep_only_the_implementation() {
        assert_eq!(
            squeezed("function f(a: string): string;\nfunction f(a: any) { return a; }"),
            "; function f(a ) { return a; }"
        );
    }

    #[test]
    fn exports_are_unwrapped() {
        assert_eq!(squeezed("export function solve() {}"), "function solve() {}");
        assert_eq!(squeezed("export default class Heap {}"), "class Heap {}");
        assert_eq!(squeezed("const a = 1;\nexport { a };"), "const a = 1; ;");
    }

    #[test]
    fn class_members_lose_their_modifiers() {
        let source = "abstract class Shape implements Named, Sized {\n  private readonly sides!: number;\n  static count?: number = 0;\n  abstract area(): number;\n  protected describe(this: Shape, label?: string): string { return label ?? ''; }\n}";
        assert_eq!(
            squeezed(source),
            "class Shape { sides ; static count = 0; ; describe( label ) { return label ?? ''; } }"
        );
    }

    #[test]
    fn parameter_properties_become_assignments() {
        assert_eq!(
            squeezed("class P { constructor(public x: number, private y = 2) {} }"),
            "class P { constructor( x , y = 2) {; this.x = x; this.y = y;} }"
        );
        assert_eq!(
            squeezed("class Q extends P { constructor(readonly z: number) { super(1)\n  log(z); } }"),
            "class Q extends P { constructor( z ) { super(1); this.z = z; log(z); } }"
        );
    }

    #[test]
    fn runtime_constructs_without_an_erasure_are_unsupported() {
        for (source, construct) in [
            ("enum Color { Red }", "enum"),
            ("namespace N { export const x = 1; }", "namespace"),
            ("import { x } from './x';", "import"),
            ("async function f() {}", "async functions"),
            ("const f = async () => 1;", "async arrow functions"),
            ("export * from './x';", "export * from"),
            ("export default 42;", "export default of an expression"),
        ] {
            match erased(source) {
                Err(CompileError::Unsupported { construct: found, .. }) => assert_eq!(found, construct, "{source}"),
                other => panic!("{source}: expected unsupported construct, got {other:?}"),
            }
        }
    }

    #[test]
    fn unsupported_constructs_report_their_position() {
        let err = erased("function f() {}\n\n  enum E { A }").unwrap_err();
        assert_eq!(
            err,
            CompileError::Unsupported {
                construct: "enum".to_string(),
                pos: Position { line: 3, col: 3 }
            }
        );
    }

    #[test]
    fn plain_javascript_is_untouched() {
        let source = "function* gen() { yield /a+b/.test(`x${1}`); }\nconst t = String.raw`\\n`;";
        assert_eq!(erased(source).unwrap(), source);
    }
}
