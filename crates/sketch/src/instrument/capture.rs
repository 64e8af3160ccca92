//! Capture injection: every naked top-level expression gets its value pushed
//! onto `__RESULTS__` together with its source line.

use super::{CONSOLE_IDENTIFIER, RESULTS_IDENTIFIER};
use crate::parser::{Expression, Pattern, Program, SourceCode, Spanned, Statement, SyntaxError, parse_program};

#[derive(Debug, Clone, PartialEq)]
pub struct Capture<'code> {
    pub line: usize,
    pub expression: &'code str,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    #[error("type-erased code does not parse: {0}")]
    Erased(String),
    #[error("instrumented code does not parse: {0}")]
    Instrumented(String),
}

#[derive(Debug, Clone)]
pub struct Injected {
    pub code: String,
    pub captures: usize,
}

fn first_message(errors: &[SyntaxError]) -> String {
    errors
        .first()
        .map(SyntaxError::to_string)
        .unwrap_or_default()
}

/// Naked expressions of the top level, in source order.
pub fn collect(code: &str) -> Result<Vec<Capture<'_>>, CaptureError> {
    let program = parse_program(code).map_err(|errors| CaptureError::Erased(first_message(&errors)))?;
    Ok(naked_expressions(code, &program))
}

fn naked_expressions<'code>(code: &'code str, program: &Program) -> Vec<Capture<'code>> {
    let source = SourceCode::new(code);
    program
        .iter()
        .filter_map(|statement| match &statement.node {
            Statement::Expression(expression) if is_naked(expression) => Some(Capture {
                line: source.line_of(statement.span.start),
                expression: code.get(expression.span.into_range()).unwrap_or_default().trim(),
            }),
            _ => None,
        })
        .collect()
}

/// Whether the top level already declares the capture array.
fn declares_results(program: &Program) -> bool {
    program.iter().any(|statement| match &statement.node {
        Statement::Variable(declaration) => declaration
            .declarators
            .iter()
            .any(|declarator| matches!(&declarator.pattern, Pattern::Identifier(name) if name == RESULTS_IDENTIFIER)),
        _ => false,
    })
}

fn count_pushes(program: &Program) -> usize {
    program
        .iter()
        .filter(|statement| {
            matches!(&statement.node, Statement::Expression(expression)
                if is_method_call_on(&expression.node, RESULTS_IDENTIFIER))
        })
        .count()
}

fn is_naked(expression: &Spanned<Expression>) -> bool {
    !expression.node.is_assignment()
        && !is_method_call_on(&expression.node, RESULTS_IDENTIFIER)
        && !is_method_call_on(&expression.node, CONSOLE_IDENTIFIER)
}

fn is_method_call_on(expression: &Expression, object_name: &str) -> bool {
    let Expression::Call { callee, .. } = expression else {
        return false;
    };
    let Expression::Member { object, .. } = &callee.node else {
        return false;
    };
    matches!(&object.node, Expression::Identifier(name) if name == object_name)
}

/// Appends the capture statements to `erased`.
///
/// Code that already declares the capture array at its top level is
/// returned unchanged, so instrumenting twice is the same as once.
pub fn inject(erased: &str) -> Result<Injected, CaptureError> {
    let program = parse_program(erased).map_err(|errors| CaptureError::Erased(first_message(&errors)))?;
    if declares_results(&program) {
        return Ok(Injected {
            code: erased.to_string(),
            captures: count_pushes(&program),
        });
    }

    let captures = naked_expressions(erased, &program);
    let mut code = String::with_capacity(erased.len() + 64 * (captures.len() + 1));
    // Same physical line as the user's first line.
    code.push_str(&format!("const {RESULTS_IDENTIFIER} = [];{erased}\n"));
    for capture in &captures {
        code.push_str(&format!(
            "{RESULTS_IDENTIFIER}.push({{ line: {}, value: ({}) }});\n",
            capture.line, capture.expression
        ));
    }
    code.push_str(&format!("return {RESULTS_IDENTIFIER};"));
    parse_program(&code).map_err(|errors| CaptureError::Instrumented(first_message(&errors)))?;
    Ok(Injected {
        code,
        captures: captures.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_naked_expressions_only() {
        let code = "const a = 1\na\na + 1\nconsole.log(a)\na = 2\na++\n__RESULTS__.push(a)\nfunction f() { a }\nf()";
        let captures = collect(code).unwrap();
        assert_eq!(
            captures,
            vec![
                Capture { line: 2, expression: "a" },
                Capture { line: 3, expression: "a + 1" },
                Capture { line: 9, expression: "f()" },
            ]
        );
    }

    #[test]
    fn injected_code_shape() {
        let injected = inject("const x = 2\nx * 3").unwrap();
        assert_eq!(injected.captures, 1);
        assert_eq!(
            injected.code,
            "const __RESULTS__ = [];const x = 2\nx * 3\n__RESULTS__.push({ line: 2, value: (x * 3) });\nreturn __RESULTS__;"
        );
    }

    #[test]
    fn no_captures_still_returns_array() {
        let injected = inject("let y = 1").unwrap();
        assert_eq!(injected.captures, 0);
        assert!(injected.code.ends_with("\nreturn __RESULTS__;"));
    }

    #[test]
    fn existing_capture_array_is_left_alone() {
        let code = "const __RESULTS__ = [];1\n__RESULTS__.push({ line: 1, value: (1) });\nreturn __RESULTS__;";
        let injected = inject(code).unwrap();
        assert_eq!(injected.code, code);
        assert_eq!(injected.captures, 1);
    }

    #[test]
    fn results_named_in_a_nested_scope_still_gets_captures() {
        let injected = inject("function f() { const __RESULTS__ = [] }\nf()").unwrap();
        assert_eq!(injected.captures, 1);
        assert!(injected.code.starts_with("const __RESULTS__ = [];function f()"));
    }

    #[test]
    fn multiline_expression_keeps_start_line() {
        let captures = collect("\n[1, 2]\n  .map(n => n * 2)").unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].line, 2);
    }
}
