//! Type erasure by blanking.
//!
//! Every byte of type-only syntax becomes a space, line breaks stay, so byte
//! offsets and line numbers of the remaining code are unchanged. The one
//! exception is constructor parameter properties, which need an inserted
//! `this.name = name` to keep their runtime meaning.

use crate::parser::{
    Class, Expression, Function, FunctionBody, Pattern, Program, Span, Statement, TypeAnnotation, Visitor,
    walk_class, walk_program,
};

#[derive(Default)]
struct TypeSyntax {
    blanked: Vec<Span>,
    // Statements that vanish entirely; their first byte becomes `;`.
    removed: Vec<Span>,
    insertions: Vec<(usize, String)>,
}

impl TypeSyntax {
    fn parameter_properties(&mut self, constructor: &Function) {
        let names = constructor
            .parameters
            .iter()
            .filter(|parameter| parameter.property.is_some())
            .filter_map(|parameter| match &parameter.pattern {
                Pattern::Identifier(name) => Some(name.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>();
        if names.is_empty() {
            return;
        }
        let FunctionBody::Block(statements) = &constructor.body else {
            return;
        };
        // Derived classes may only touch `this` after `super(...)`.
        let super_call = statements.iter().find(|statement| {
            matches!(
                &statement.node,
                Statement::Expression(expression)
                    if matches!(expression.node, Expression::SuperCall(_))
            )
        });
        let position = match (super_call, statements.first()) {
            (Some(statement), _) => statement.span.end,
            (None, Some(statement)) => statement.span.start,
            (None, None) => constructor.span.end.saturating_sub(1),
        };
        let assignments = names
            .iter()
            .map(|name| format!("this.{name} = {name};"))
            .collect::<String>();
        self.insertions.push((position, format!(";{assignments}")));
    }
}

impl Visitor for TypeSyntax {
    fn visit_class(&mut self, class: &Class) {
        if let Some(constructor) = class.constructor() {
            self.parameter_properties(constructor);
        }
        walk_class(self, class);
    }

    fn visit_type_annotation(&mut self, annotation: TypeAnnotation) {
        self.blanked.push(annotation.span);
    }

    fn visit_type_only(&mut self, span: Span) {
        self.removed.push(span);
    }
}

/// Removes all type syntax of an already parsed `source`.
pub fn erase(source: &str, program: &Program) -> String {
    let mut syntax = TypeSyntax::default();
    walk_program(&mut syntax, program);

    let mut bytes = source.as_bytes().to_vec();
    for span in syntax.blanked.iter().chain(&syntax.removed) {
        let end = span.end.min(bytes.len());
        for byte in &mut bytes[span.start.min(end)..end] {
            if !matches!(*byte, b'\n' | b'\r') {
                *byte = b' ';
            }
        }
    }
    // A removed statement may sit between two lines that would otherwise join.
    for span in &syntax.removed {
        if let Some(byte) = bytes.get_mut(span.start)
            && *byte == b' '
        {
            *byte = b';';
        }
    }
    let mut code = String::from_utf8_lossy(&bytes).into_owned();

    syntax.insertions.sort_by(|left, right| right.0.cmp(&left.0));
    for (position, text) in syntax.insertions {
        if code.is_char_boundary(position) {
            code.insert_str(position, &text);
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn erased(source: &str) -> String {
        let program = parse_program(source).unwrap();
        erase(source, &program)
    }

    #[test]
    fn blanks_annotations_and_keeps_lines() {
        let source = "const total: number = add(1, 2) as number\nfunction add<T>(a: number, b?: number): number {\n  return a + (b ?? 0)\n}\nlet name!: string\nname = user!.name";
        let code = erased(source);
        assert_eq!(code.len(), source.len());
        assert_eq!(code.lines().count(), source.lines().count());
        for fragment in [": number", "as number", "<T>", "b?", "name!", "user!"] {
            assert!(!code.contains(fragment), "{fragment} left in {code}");
        }
        assert!(code.contains("return a + (b ?? 0)"));
        assert!(parse_program(&code).is_ok());
    }

    #[test]
    fn removes_type_declarations() {
        let source = "const a = 1\ntype Point = { x: number };\n[a].length\ninterface Named { name: string }";
        let code = erased(source);
        assert_eq!(code.lines().count(), source.lines().count());
        assert!(!code.contains("Point"));
        assert!(!code.contains("interface"));
        // The leftover `;` keeps `[a]` from indexing into `1`.
        let program = parse_program(&code).unwrap();
        assert!(
            program
                .iter()
                .any(|statement| matches!(statement.node, Statement::Expression(_)))
        );
    }

    #[test]
    fn class_modifiers_and_parameter_properties() {
        let source = "class Point implements Shape {\n  private readonly label: string = 'p'\n  constructor(public x: number, private y = 0) {\n    this.check()\n  }\n  check(): void {}\n}";
        let code = erased(source);
        assert_eq!(code.lines().count(), source.lines().count());
        assert!(!code.contains("implements"));
        assert!(!code.contains("private"));
        assert!(code.contains(";this.x = x;this.y = y;this.check()"));
        assert!(parse_program(&code).is_ok());
    }

    #[test]
    fn parameter_properties_follow_super_call() {
        let code = erased("class B extends A {\n  constructor(readonly id: string) {\n    super()\n  }\n}");
        assert!(code.contains("super();this.id = id;"));
    }
}
