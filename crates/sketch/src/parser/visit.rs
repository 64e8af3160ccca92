//! Read-only traversal over the syntax tree.
//!
//! Override the `visit_*` hooks you care about and call the matching `walk_*`
//! function to keep descending.

use super::ast::*;
use super::{Span, Spanned};

pub trait Visitor {
    fn visit_statement(&mut self, statement: &Spanned<Statement>) {
        walk_statement(self, statement);
    }

    fn visit_expression(&mut self, expression: &Spanned<Expression>) {
        walk_expression(self, expression);
    }

    fn visit_pattern(&mut self, pattern: &Pattern) {
        walk_pattern(self, pattern);
    }

    fn visit_function(&mut self, function: &Function) {
        walk_function(self, function);
    }

    fn visit_class(&mut self, class: &Class) {
        walk_class(self, class);
    }

    fn visit_type_annotation(&mut self, _annotation: TypeAnnotation) {}

    /// Statements that exist only for the type checker.
    fn visit_type_only(&mut self, _span: Span) {}
}

pub fn walk_program<V: Visitor + ?Sized>(visitor: &mut V, program: &[Spanned<Statement>]) {
    for statement in program {
        visitor.visit_statement(statement);
    }
}

pub fn walk_statement<V: Visitor + ?Sized>(visitor: &mut V, statement: &Spanned<Statement>) {
    match &statement.node {
        Statement::Expression(expression) | Statement::Throw(expression) => {
            visitor.visit_expression(expression);
        }
        Statement::Variable(declaration) => walk_variable_declaration(visitor, declaration),
        Statement::Function(function) => visitor.visit_function(function),
        Statement::Class(class) => visitor.visit_class(class),
        Statement::Return(argument) => {
            if let Some(argument) = argument {
                visitor.visit_expression(argument);
            }
        }
        Statement::If {
            test,
            consequent,
            alternate,
        } => {
            visitor.visit_expression(test);
            visitor.visit_statement(consequent);
            if let Some(alternate) = alternate {
                visitor.visit_statement(alternate);
            }
        }
        Statement::For {
            init,
            test,
            update,
            body,
        } => {
            match init {
                Some(ForInit::Variable(declaration)) => walk_variable_declaration(visitor, declaration),
                Some(ForInit::Expression(expression)) => visitor.visit_expression(expression),
                None => {}
            }
            for expression in [test, update].into_iter().flatten() {
                visitor.visit_expression(expression);
            }
            visitor.visit_statement(body);
        }
        Statement::ForOf {
            binding,
            iterable: source,
            body,
        }
        | Statement::ForIn {
            binding,
            object: source,
            body,
        } => {
            visitor.visit_pattern(&binding.pattern);
            visitor.visit_expression(source);
            visitor.visit_statement(body);
        }
        Statement::While { test, body } | Statement::DoWhile { body, test } => {
            visitor.visit_expression(test);
            visitor.visit_statement(body);
        }
        Statement::Block(statements) => walk_program(visitor, statements),
        Statement::Try {
            block,
            handler,
            finalizer,
        } => {
            walk_program(visitor, block);
            if let Some(handler) = handler {
                if let Some(parameter) = &handler.parameter {
                    visitor.visit_pattern(parameter);
                }
                if let Some(annotation) = handler.annotation {
                    visitor.visit_type_annotation(annotation);
                }
                walk_program(visitor, &handler.body);
            }
            if let Some(finalizer) = finalizer {
                walk_program(visitor, finalizer);
            }
        }
        Statement::Switch {
            discriminant,
            cases,
        } => {
            visitor.visit_expression(discriminant);
            for case in cases {
                if let Some(test) = &case.test {
                    visitor.visit_expression(test);
                }
                walk_program(visitor, &case.body);
            }
        }
        Statement::Labeled { body, .. } => visitor.visit_statement(body),
        Statement::Enum(declaration) => {
            for member in &declaration.members {
                if let Some(init) = &member.init {
                    visitor.visit_expression(init);
                }
            }
        }
        Statement::TypeOnly => visitor.visit_type_only(statement.span),
        Statement::Break(_) | Statement::Continue(_) | Statement::Empty => {}
    }
}

fn walk_variable_declaration<V: Visitor + ?Sized>(visitor: &mut V, declaration: &VariableDeclaration) {
    for declarator in &declaration.declarators {
        visitor.visit_pattern(&declarator.pattern);
        if let Some(annotation) = declarator.annotation {
            visitor.visit_type_annotation(annotation);
        }
        if let Some(init) = &declarator.init {
            visitor.visit_expression(init);
        }
    }
}

pub fn walk_expression<V: Visitor + ?Sized>(visitor: &mut V, expression: &Spanned<Expression>) {
    match &expression.node {
        Expression::Number(_)
        | Expression::String(_)
        | Expression::Boolean(_)
        | Expression::Regex { .. }
        | Expression::Null
        | Expression::This
        | Expression::Identifier(_)
        | Expression::SuperMember(_) => {}
        Expression::Template { expressions, .. } | Expression::Sequence(expressions) => {
            for expression in expressions {
                visitor.visit_expression(expression);
            }
        }
        Expression::TaggedTemplate { tag, expressions, .. } => {
            visitor.visit_expression(tag);
            for expression in expressions {
                visitor.visit_expression(expression);
            }
        }
        Expression::Await(argument) => visitor.visit_expression(argument),
        Expression::Array(elements) | Expression::SuperCall(elements) => walk_arguments(visitor, elements),
        Expression::Object(properties) => {
            for property in properties {
                match property {
                    ObjectProperty::KeyValue { key, value } => {
                        walk_property_key(visitor, key);
                        visitor.visit_expression(value);
                    }
                    ObjectProperty::Shorthand(_) => {}
                    ObjectProperty::Method { key, function, .. } => {
                        walk_property_key(visitor, key);
                        visitor.visit_function(function);
                    }
                    ObjectProperty::Spread(value) => visitor.visit_expression(value),
                }
            }
        }
        Expression::Function(function) => visitor.visit_function(function),
        Expression::Unary { operand, .. } => visitor.visit_expression(operand),
        Expression::Update { target, .. } => visitor.visit_expression(target),
        Expression::Binary { left, right, .. } | Expression::Logical { left, right, .. } => {
            visitor.visit_expression(left);
            visitor.visit_expression(right);
        }
        Expression::Assign { target, value, .. } => {
            visitor.visit_expression(target);
            visitor.visit_expression(value);
        }
        Expression::Conditional {
            test,
            consequent,
            alternate,
        } => {
            visitor.visit_expression(test);
            visitor.visit_expression(consequent);
            visitor.visit_expression(alternate);
        }
        Expression::Call { callee, arguments, .. } | Expression::New { callee, arguments } => {
            visitor.visit_expression(callee);
            walk_arguments(visitor, arguments);
        }
        Expression::Member { object, property, .. } => {
            visitor.visit_expression(object);
            if let MemberProperty::Computed(index) = property {
                visitor.visit_expression(index);
            }
        }
        Expression::TypeAssertion {
            expression,
            annotation,
        } => {
            visitor.visit_expression(expression);
            visitor.visit_type_annotation(*annotation);
        }
    }
}

fn walk_arguments<V: Visitor + ?Sized>(visitor: &mut V, arguments: &[Argument]) {
    for argument in arguments {
        match argument {
            Argument::Expression(expression) | Argument::Spread(expression) => {
                visitor.visit_expression(expression);
            }
        }
    }
}

fn walk_property_key<V: Visitor + ?Sized>(visitor: &mut V, key: &PropertyKey) {
    if let PropertyKey::Computed(expression) = key {
        visitor.visit_expression(expression);
    }
}

pub fn walk_pattern<V: Visitor + ?Sized>(visitor: &mut V, pattern: &Pattern) {
    match pattern {
        Pattern::Identifier(_) => {}
        Pattern::Object { properties, .. } => {
            for property in properties {
                walk_property_key(visitor, &property.key);
                visitor.visit_pattern(&property.value);
                if let Some(default) = &property.default {
                    visitor.visit_expression(default);
                }
            }
        }
        Pattern::Array { elements, rest } => {
            for element in elements.iter().flatten() {
                visitor.visit_pattern(&element.pattern);
                if let Some(default) = &element.default {
                    visitor.visit_expression(default);
                }
            }
            if let Some(rest) = rest {
                visitor.visit_pattern(rest);
            }
        }
    }
}

pub fn walk_function<V: Visitor + ?Sized>(visitor: &mut V, function: &Function) {
    if let Some(type_parameters) = function.type_parameters {
        visitor.visit_type_annotation(type_parameters);
    }
    for parameter in &function.parameters {
        if let Some(property) = parameter.property {
            visitor.visit_type_annotation(property);
        }
        visitor.visit_pattern(&parameter.pattern);
        if let Some(annotation) = parameter.annotation {
            visitor.visit_type_annotation(annotation);
        }
        if let Some(default) = &parameter.default {
            visitor.visit_expression(default);
        }
    }
    if let Some(return_type) = function.return_type {
        visitor.visit_type_annotation(return_type);
    }
    match &function.body {
        FunctionBody::Block(statements) => walk_program(visitor, statements),
        FunctionBody::Expression(expression) => visitor.visit_expression(expression),
    }
}

pub fn walk_class<V: Visitor + ?Sized>(visitor: &mut V, class: &Class) {
    let annotations = [class.type_parameters, class.super_type_arguments, class.implements];
    if let Some(super_class) = &class.super_class {
        visitor.visit_expression(super_class);
    }
    for annotation in annotations.into_iter().flatten() {
        visitor.visit_type_annotation(annotation);
    }
    for member in &class.members {
        for modifier in &member.modifiers {
            visitor.visit_type_annotation(*modifier);
        }
        match &member.kind {
            ClassMemberKind::Constructor(function) => visitor.visit_function(function),
            ClassMemberKind::Method { key, function, .. } => {
                walk_property_key(visitor, key);
                visitor.visit_function(function);
            }
            ClassMemberKind::Field { key, annotation, value } => {
                walk_property_key(visitor, key);
                if let Some(annotation) = annotation {
                    visitor.visit_type_annotation(*annotation);
                }
                if let Some(value) = value {
                    visitor.visit_expression(value);
                }
            }
            ClassMemberKind::Signature(annotation) => visitor.visit_type_annotation(*annotation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    #[derive(Default)]
    struct Counter {
        identifiers: Vec<String>,
        annotations: usize,
        type_only: usize,
    }

    impl Visitor for Counter {
        fn visit_expression(&mut self, expression: &Spanned<Expression>) {
            if let Expression::Identifier(name) = &expression.node {
                self.identifiers.push(name.clone());
            }
            walk_expression(self, expression);
        }

        fn visit_type_annotation(&mut self, _annotation: TypeAnnotation) {
            self.annotations += 1;
        }

        fn visit_type_only(&mut self, _span: Span) {
            self.type_only += 1;
        }
    }

    #[test]
    fn visits_nested_nodes() {
        let program = parse_program(
            "type Id = string\nfunction f<T>(a: T): T { return g(a as T) }\nconst b: number = f(c)",
        )
        .unwrap();
        let mut counter = Counter::default();
        walk_program(&mut counter, &program);
        assert_eq!(counter.identifiers, vec!["g", "a", "f", "c"]);
        // `<T>`, `: T`, `: T` return, `as T`, `: number`
        assert_eq!(counter.annotations, 5);
        assert_eq!(counter.type_only, 1);
    }
}
