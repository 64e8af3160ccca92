//! Tree-walking evaluation of the instrumented program.

use super::SandboxLimits;
use super::builtins::{self, Awaited};
use super::environment::Environment;
use super::realm::{ErrorKind, Heap, Realm};
use super::scope::{AssignError, FunctionContext, Lookup, Scope, ScopeRef};
use super::timers::TimerQueue;
use super::value::{
    BoundFunction, ClassFunction, Closure, ClosureKind, Function, NativeCall, NativeFn, Object, ObjectKind, ObjectRef,
    Property, PropertyKey, Value,
};
use crate::error::RuntimeError;
use crate::output::LogEntry;
use crate::parser::{
    self, Argument, AssignOperator, ClassMemberKind, DeclarationKind, Expression, ForBinding, ForInit, FunctionBody,
    LogicalOperator, MemberProperty, MethodKind, ObjectProperty, Pattern, Program, SourceCode, Spanned, Statement,
    SwitchCase, UnaryOperator, UpdateOperator, VariableDeclaration,
};
use std::ops::ControlFlow;
use std::rc::Rc;

/// Why evaluation stopped early.
pub enum Interrupt {
    /// A script value in flight, catchable by `try`.
    Throw(Value),
    /// A limit the engine enforces; `try` cannot catch it.
    Halt(RuntimeError),
    /// `await` on a promise that stays pending. Unwinds to the enclosing
    /// `async` function, whose promise then never settles.
    Suspend,
}

pub(super) enum Completion {
    Normal,
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
}

#[derive(Clone, Copy)]
enum BindMode {
    Var,
    Let,
    Const,
    Assign,
}

enum Callable {
    Closure(Closure),
    Native(NativeFn),
    Bound(BoundFunction),
    Class(String),
    None,
}

enum Reference {
    Binding(String),
    Property(Value, PropertyKey),
}

pub struct Interpreter<'sink> {
    pub realm: Realm,
    pub heap: Heap,
    pub timers: TimerQueue,
    /// `then`/`catch`/`finally` callbacks that would run on a later tick.
    pub pending_reactions: usize,
    pub logs: Vec<LogEntry>,
    environment: Environment,
    source: SourceCode,
    limits: SandboxLimits,
    steps: u64,
    depth: usize,
    sink: &'sink mut dyn FnMut(&LogEntry),
}

impl<'sink> Interpreter<'sink> {
    pub fn new(source: &str, limits: SandboxLimits, sink: &'sink mut dyn FnMut(&LogEntry)) -> Self {
        let mut heap = Heap::default();
        let realm = Realm::new(&mut heap);
        let environment = Environment::new(&mut heap, &realm);
        Self {
            realm,
            heap,
            timers: TimerQueue::default(),
            pending_reactions: 0,
            logs: Vec::new(),
            environment,
            source: SourceCode::new(source),
            limits,
            steps: 0,
            depth: 0,
            sink,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Runs `program` as the body of a function whose parameters are the
    /// environment's names, returning what the body returns.
    pub fn run(&mut self, program: &Program) -> Result<Value, Interrupt> {
        let root = Scope::root();
        root.declare("undefined", Some(Value::Undefined), false);
        root.declare("NaN", Some(Value::Number(f64::NAN)), false);
        root.declare("Infinity", Some(Value::Number(f64::INFINITY)), false);
        let unit = Scope::function(
            &root,
            Some(FunctionContext {
                this: Value::Undefined,
                home_object: None,
                class: None,
            }),
        );
        for (name, value) in self.environment.bindings() {
            unit.declare(name, Some(value.clone()), true);
        }
        self.hoist_function(program, &unit);
        match self.execute_statements(program, &unit)? {
            Completion::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    fn tick(&mut self) -> Result<(), Interrupt> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(Interrupt::Halt(RuntimeError::new(
                "RangeError",
                "Execution step limit exceeded",
            )));
        }
        Ok(())
    }

    pub fn emit(&mut self, entry: LogEntry) {
        (self.sink)(&entry);
        self.logs.push(entry);
    }

    pub fn source_text(&self, span: parser::Span) -> &str {
        self.source.slice(span)
    }

    // Allocation helpers.

    pub fn allocate(&mut self, object: Object) -> ObjectRef {
        self.heap.allocate(object)
    }

    pub fn object(&mut self) -> ObjectRef {
        self.allocate(Object::new(Some(self.realm.object_prototype.clone()), ObjectKind::Ordinary))
    }

    pub fn array(&mut self, items: Vec<Value>) -> Value {
        Value::Object(self.allocate(Object::new(
            Some(self.realm.array_prototype.clone()),
            ObjectKind::Array(items),
        )))
    }

    pub fn native(&mut self, name: &str, call: NativeFn, slots: Vec<Value>) -> Value {
        Value::Object(self.realm.native_function(&mut self.heap, name, call, None, slots))
    }

    pub fn error(&mut self, kind: ErrorKind, message: impl Into<String>) -> Value {
        let mut error = Object::new(Some(self.realm.error_prototype(kind).clone()), ObjectKind::Error);
        error.define("message", Property::hidden(Value::from(message.into())));
        Value::Object(self.allocate(error))
    }

    pub fn throw(&mut self, kind: ErrorKind, message: impl Into<String>) -> Interrupt {
        Interrupt::Throw(self.error(kind, message))
    }

    pub fn closure(
        &mut self,
        function: &Rc<parser::Function>,
        scope: &ScopeRef,
        kind: ClosureKind,
        home_object: Option<ObjectRef>,
    ) -> Value {
        let name = function.name.clone().unwrap_or_default();
        let length = function
            .parameters
            .iter()
            .take_while(|parameter| !parameter.rest && parameter.default.is_none())
            .count();
        let mut object = Object::new(
            Some(self.realm.function_prototype.clone()),
            ObjectKind::Function(Function::Closure(Closure {
                function: function.clone(),
                scope: scope.clone(),
                kind,
                home_object,
            })),
        );
        object.define("name", Property::hidden(Value::from(name)));
        object.define("length", Property::hidden(Value::from(length)));
        let object = self.allocate(object);
        if kind == ClosureKind::Normal && !function.is_async {
            let prototype = self.object();
            prototype
                .borrow_mut()
                .define("constructor", Property::hidden(Value::Object(object.clone())));
            object
                .borrow_mut()
                .define("prototype", Property::hidden(Value::Object(prototype)));
        }
        Value::Object(object)
    }

    /// Gives an anonymous function the name it is being bound to.
    fn name_function(&self, value: &Value, name: &str) {
        let Some(object) = value.as_object() else {
            return;
        };
        let mut object = object.borrow_mut();
        if !matches!(object.kind, ObjectKind::Function(Function::Closure(_))) {
            return;
        }
        let anonymous = object
            .properties
            .get(&PropertyKey::from("name"))
            .is_none_or(|property| matches!(&property.value, Value::String(text) if text.is_empty()));
        if anonymous {
            object.define("name", Property::hidden(Value::from(name)));
        }
    }

    // Declarations.

    fn hoist_function(&mut self, statements: &[Spanned<Statement>], scope: &ScopeRef) {
        let mut names = Vec::new();
        var_names(statements, &mut names);
        for name in &names {
            scope.declare_var(name);
        }
        self.hoist_lexical(statements, scope);
    }

    fn hoist_lexical(&mut self, statements: &[Spanned<Statement>], scope: &ScopeRef) {
        for statement in statements {
            match &statement.node {
                Statement::Variable(declaration) if declaration.kind != DeclarationKind::Var => {
                    let mut names = Vec::new();
                    for declarator in &declaration.declarators {
                        pattern_names(&declarator.pattern, &mut names);
                    }
                    for name in names {
                        scope.declare(&name, None, declaration.kind == DeclarationKind::Let);
                    }
                }
                Statement::Class(class) => {
                    if let Some(name) = &class.name {
                        scope.declare(name, None, true);
                    }
                }
                Statement::Function(function) => {
                    if let Some(name) = &function.name {
                        let closure = self.closure(function, scope, ClosureKind::Normal, None);
                        scope.declare(name, Some(closure), true);
                    }
                }
                _ => {}
            }
        }
    }

    fn declare_variables(&mut self, declaration: &VariableDeclaration, scope: &ScopeRef) -> Result<(), Interrupt> {
        let mode = match declaration.kind {
            DeclarationKind::Var => BindMode::Var,
            DeclarationKind::Let => BindMode::Let,
            DeclarationKind::Const => BindMode::Const,
        };
        for declarator in &declaration.declarators {
            let value = match &declarator.init {
                Some(init) => {
                    let value = self.evaluate(init, scope)?;
                    if let Pattern::Identifier(name) = &declarator.pattern {
                        self.name_function(&value, name);
                    }
                    value
                }
                None if matches!(mode, BindMode::Var) => continue,
                None => Value::Undefined,
            };
            self.bind_pattern(&declarator.pattern, value, scope, mode)?;
        }
        Ok(())
    }

    fn bind_pattern(&mut self, pattern: &Pattern, value: Value, scope: &ScopeRef, mode: BindMode) -> Result<(), Interrupt> {
        match pattern {
            Pattern::Identifier(name) => self.bind_name(name, value, scope, mode),
            Pattern::Object { properties, rest } => {
                if value.is_nullish() {
                    let found = self.describe(&value);
                    return Err(self.throw(
                        ErrorKind::Type,
                        format!("Cannot destructure '{found}' as it is {found}."),
                    ));
                }
                let mut used = Vec::with_capacity(properties.len());
                for property in properties {
                    let key = self.property_key(&property.key, scope)?;
                    let mut item = self.get(&value, &key)?;
                    if let (Value::Undefined, Some(default)) = (&item, &property.default) {
                        item = self.evaluate(default, scope)?;
                    }
                    used.push(key);
                    self.bind_pattern(&property.value, item, scope, mode)?;
                }
                if let Some(rest) = rest {
                    let remaining = self.object();
                    let keys = match &value {
                        Value::Object(object) => object.borrow().enumerable_keys(),
                        _ => Vec::new(),
                    };
                    for key in keys.into_iter().filter(|key| !used.contains(key)) {
                        let item = self.get(&value, &key)?;
                        remaining.borrow_mut().define(key, Property::enumerable(item));
                    }
                    self.bind_name(rest, Value::Object(remaining), scope, mode)?;
                }
                Ok(())
            }
            Pattern::Array { elements, rest } => {
                let items = self.iterate(&value)?;
                for (index, element) in elements.iter().enumerate() {
                    let Some(element) = element else {
                        continue;
                    };
                    let mut item = items.get(index).cloned().unwrap_or_default();
                    if let (Value::Undefined, Some(default)) = (&item, &element.default) {
                        item = self.evaluate(default, scope)?;
                    }
                    self.bind_pattern(&element.pattern, item, scope, mode)?;
                }
                if let Some(rest) = rest {
                    let remaining = items.get(elements.len()..).map(<[Value]>::to_vec).unwrap_or_default();
                    let remaining = self.array(remaining);
                    self.bind_pattern(rest, remaining, scope, mode)?;
                }
                Ok(())
            }
        }
    }

    fn bind_name(&mut self, name: &str, value: Value, scope: &ScopeRef, mode: BindMode) -> Result<(), Interrupt> {
        match mode {
            BindMode::Var | BindMode::Assign => self.assign_binding(name, value, scope),
            BindMode::Let => {
                scope.declare(name, Some(value), true);
                Ok(())
            }
            BindMode::Const => {
                scope.declare(name, Some(value), false);
                Ok(())
            }
        }
    }

    fn assign_binding(&mut self, name: &str, value: Value, scope: &ScopeRef) -> Result<(), Interrupt> {
        match scope.assign(name, value) {
            Ok(()) => Ok(()),
            Err(AssignError::Missing) => Err(self.throw(ErrorKind::Reference, format!("{name} is not defined"))),
            Err(AssignError::Uninitialized) => Err(self.throw(
                ErrorKind::Reference,
                format!("Cannot access '{name}' before initialization"),
            )),
            Err(AssignError::Constant) => Err(self.throw(ErrorKind::Type, "Assignment to constant variable.")),
        }
    }

    fn lookup(&mut self, name: &str, scope: &ScopeRef) -> Result<Value, Interrupt> {
        match scope.lookup(name) {
            Lookup::Found(value) => Ok(value),
            Lookup::Missing => Err(self.throw(ErrorKind::Reference, format!("{name} is not defined"))),
            Lookup::Uninitialized => Err(self.throw(
                ErrorKind::Reference,
                format!("Cannot access '{name}' before initialization"),
            )),
        }
    }

    // Statements.

    pub(super) fn execute_statements(
        &mut self,
        statements: &[Spanned<Statement>],
        scope: &ScopeRef,
    ) -> Result<Completion, Interrupt> {
        for statement in statements {
            match self.execute(statement, scope)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn execute_block(&mut self, statements: &[Spanned<Statement>], scope: &ScopeRef) -> Result<Completion, Interrupt> {
        let block = Scope::block(scope);
        self.hoist_lexical(statements, &block);
        self.execute_statements(statements, &block)
    }

    fn execute(&mut self, statement: &Spanned<Statement>, scope: &ScopeRef) -> Result<Completion, Interrupt> {
        self.execute_labeled(statement, scope, &[])
    }

    /// Executes `statement` under the labels written directly in front of it.
    fn execute_labeled<'a>(
        &mut self,
        statement: &'a Spanned<Statement>,
        scope: &ScopeRef,
        labels: &[&'a str],
    ) -> Result<Completion, Interrupt> {
        self.tick()?;
        match &statement.node {
            Statement::Expression(expression) => {
                self.evaluate(expression, scope)?;
                Ok(Completion::Normal)
            }
            Statement::Variable(declaration) => {
                self.declare_variables(declaration, scope)?;
                Ok(Completion::Normal)
            }
            Statement::Function(_) | Statement::Empty | Statement::TypeOnly => Ok(Completion::Normal),
            Statement::Enum(declaration) => {
                self.execute_enum(declaration, scope)?;
                Ok(Completion::Normal)
            }
            Statement::Class(class) => {
                let constructor = self.evaluate_class(class, scope)?;
                if let Some(name) = &class.name {
                    scope.declare(name, Some(Value::Object(constructor)), true);
                }
                Ok(Completion::Normal)
            }
            Statement::Return(value) => {
                let value = match value {
                    Some(value) => self.evaluate(value, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Statement::If {
                test,
                consequent,
                alternate,
            } => {
                if self.evaluate(test, scope)?.is_truthy() {
                    self.execute(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.execute(alternate, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Statement::For {
                init,
                test,
                update,
                body,
            } => self.execute_for(init.as_ref(), test.as_ref(), update.as_ref(), body, scope, labels),
            Statement::ForOf {
                binding,
                iterable,
                body,
            } => {
                let iterable = self.evaluate(iterable, scope)?;
                let items = self.iterate(&iterable)?;
                self.execute_for_each(binding, items, body, scope, labels)
            }
            Statement::ForIn { binding, object, body } => {
                let object = self.evaluate(object, scope)?;
                let keys = match &object {
                    Value::Object(object) => object
                        .borrow()
                        .enumerable_keys()
                        .into_iter()
                        .map(|key| Value::from(key.to_string()))
                        .collect(),
                    Value::String(text) => (0..text.chars().count()).map(|index| Value::from(index.to_string())).collect(),
                    _ => Vec::new(),
                };
                self.execute_for_each(binding, keys, body, scope, labels)
            }
            Statement::While { test, body } => {
                while self.evaluate(test, scope)?.is_truthy() {
                    if let ControlFlow::Break(completion) = loop_control(self.execute(body, scope)?, labels) {
                        return Ok(completion);
                    }
                }
                Ok(Completion::Normal)
            }
            Statement::DoWhile { body, test } => {
                loop {
                    if let ControlFlow::Break(completion) = loop_control(self.execute(body, scope)?, labels) {
                        return Ok(completion);
                    }
                    if !self.evaluate(test, scope)?.is_truthy() {
                        break;
                    }
                }
                Ok(Completion::Normal)
            }
            Statement::Break(label) => Ok(Completion::Break(label.clone())),
            Statement::Continue(label) => Ok(Completion::Continue(label.clone())),
            Statement::Labeled { label, body } => {
                let mut nested = labels.to_vec();
                nested.push(label.as_str());
                match self.execute_labeled(body, scope, &nested)? {
                    Completion::Break(Some(target)) if target == *label => Ok(Completion::Normal),
                    completion => Ok(completion),
                }
            }
            Statement::Block(statements) => self.execute_block(statements, scope),
            Statement::Throw(value) => {
                let value = self.evaluate(value, scope)?;
                Err(Interrupt::Throw(value))
            }
            Statement::Try {
                block,
                handler,
                finalizer,
            } => {
                let result = match self.execute_block(block, scope) {
                    Err(Interrupt::Throw(value)) => match handler {
                        Some(handler) => {
                            let catch_scope = Scope::block(scope);
                            match &handler.parameter {
                                Some(parameter) => self
                                    .bind_pattern(parameter, value, &catch_scope, BindMode::Let)
                                    .and_then(|()| self.execute_block(&handler.body, &catch_scope)),
                                None => self.execute_block(&handler.body, &catch_scope),
                            }
                        }
                        None => Err(Interrupt::Throw(value)),
                    },
                    other => other,
                };
                let Some(finalizer) = finalizer else {
                    return result;
                };
                if matches!(result, Err(Interrupt::Halt(_) | Interrupt::Suspend)) {
                    return result;
                }
                match self.execute_block(finalizer, scope)? {
                    Completion::Normal => result,
                    abrupt => Ok(abrupt),
                }
            }
            Statement::Switch { discriminant, cases } => self.execute_switch(discriminant, cases, scope),
        }
    }

    fn execute_for(
        &mut self,
        init: Option<&ForInit>,
        test: Option<&Spanned<Expression>>,
        update: Option<&Spanned<Expression>>,
        body: &Spanned<Statement>,
        scope: &ScopeRef,
        labels: &[&str],
    ) -> Result<Completion, Interrupt> {
        let loop_scope = Scope::block(scope);
        let mut per_iteration = Vec::new();
        match init {
            Some(ForInit::Variable(declaration)) => {
                if declaration.kind != DeclarationKind::Var {
                    for declarator in &declaration.declarators {
                        pattern_names(&declarator.pattern, &mut per_iteration);
                    }
                    for name in &per_iteration {
                        loop_scope.declare(name, None, declaration.kind == DeclarationKind::Let);
                    }
                }
                self.declare_variables(declaration, &loop_scope)?;
            }
            Some(ForInit::Expression(expression)) => {
                self.evaluate(expression, &loop_scope)?;
            }
            None => {}
        }
        // Closures created in the body see the bindings of their own iteration.
        let mut iteration = if per_iteration.is_empty() {
            loop_scope
        } else {
            loop_scope.copy_bindings(&per_iteration)
        };
        loop {
            if let Some(test) = test
                && !self.evaluate(test, &iteration)?.is_truthy()
            {
                break;
            }
            if let ControlFlow::Break(completion) = loop_control(self.execute(body, &iteration)?, labels) {
                return Ok(completion);
            }
            if !per_iteration.is_empty() {
                iteration = iteration.copy_bindings(&per_iteration);
            }
            if let Some(update) = update {
                self.evaluate(update, &iteration)?;
            }
        }
        Ok(Completion::Normal)
    }

    fn execute_for_each(
        &mut self,
        binding: &ForBinding,
        items: Vec<Value>,
        body: &Spanned<Statement>,
        scope: &ScopeRef,
        labels: &[&str],
    ) -> Result<Completion, Interrupt> {
        let mode = match binding.kind {
            Some(DeclarationKind::Var) => BindMode::Var,
            Some(DeclarationKind::Let) => BindMode::Let,
            Some(DeclarationKind::Const) => BindMode::Const,
            None => BindMode::Assign,
        };
        for item in items {
            let iteration = Scope::block(scope);
            self.bind_pattern(&binding.pattern, item, &iteration, mode)?;
            if let ControlFlow::Break(completion) = loop_control(self.execute(body, &iteration)?, labels) {
                return Ok(completion);
            }
        }
        Ok(Completion::Normal)
    }

    fn execute_switch(
        &mut self,
        discriminant: &Spanned<Expression>,
        cases: &[SwitchCase],
        scope: &ScopeRef,
    ) -> Result<Completion, Interrupt> {
        let value = self.evaluate(discriminant, scope)?;
        let switch_scope = Scope::block(scope);
        for case in cases {
            self.hoist_lexical(&case.body, &switch_scope);
        }
        let mut start = None;
        for (index, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test
                && self.evaluate(test, &switch_scope)?.strict_equals(&value)
            {
                start = Some(index);
                break;
            }
        }
        let Some(start) = start.or_else(|| cases.iter().position(|case| case.test.is_none())) else {
            return Ok(Completion::Normal);
        };
        for case in &cases[start..] {
            match self.execute_statements(&case.body, &switch_scope)? {
                Completion::Normal => {}
                Completion::Break(None) => return Ok(Completion::Normal),
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    /// Lowers `enum` to an object mapping names to values and numeric
    /// values back to names. Declarations of the same name merge.
    fn execute_enum(&mut self, declaration: &parser::Enum, scope: &ScopeRef) -> Result<(), Interrupt> {
        let object = match scope.lookup(&declaration.name) {
            Lookup::Found(Value::Object(existing)) => existing,
            _ => self.object(),
        };
        let target = Value::Object(object);
        let members = Scope::block(scope);
        let mut next = Some(0.0);
        for member in &declaration.members {
            let value = match (&member.init, next) {
                (Some(init), _) => self.evaluate(init, &members)?,
                (None, Some(number)) => Value::Number(number),
                (None, None) => return Err(self.throw(ErrorKind::Type, "Enum member must have initializer.")),
            };
            next = match value {
                Value::Number(number) => Some(number + 1.0),
                _ => None,
            };
            self.set(&target, PropertyKey::from(member.name.as_str()), value.clone())?;
            if let Value::Number(_) = value {
                let reverse = self.to_property_key(&value)?;
                self.set(&target, reverse, Value::from(member.name.as_str()))?;
            }
            members.declare(&member.name, Some(value), false);
        }
        self.assign_binding(&declaration.name, target, scope)
    }

    // Expressions.

    pub(super) fn evaluate(&mut self, expression: &Spanned<Expression>, scope: &ScopeRef) -> Result<Value, Interrupt> {
        self.tick()?;
        match &expression.node {
            Expression::Number(number) => Ok(Value::Number(*number)),
            Expression::String(text) => Ok(Value::from(text.as_str())),
            Expression::Template { quasis, expressions } => {
                let mut text = String::new();
                for (index, quasi) in quasis.iter().enumerate() {
                    text.push_str(quasi);
                    if let Some(expression) = expressions.get(index) {
                        let value = self.evaluate(expression, scope)?;
                        text.push_str(&self.to_string(&value)?);
                    }
                }
                Ok(Value::from(text))
            }
            Expression::Regex { pattern, flags } => Ok(Value::Object(builtins::create_regexp(self, pattern, flags)?)),
            Expression::TaggedTemplate {
                tag,
                quasis,
                raw,
                expressions,
            } => {
                let Some((this, function)) = self.callee(tag, scope)? else {
                    return Ok(Value::Undefined);
                };
                let cooked = quasis.iter().map(|quasi| Value::from(quasi.as_str())).collect();
                let strings = self.array(cooked);
                let raw = raw.iter().map(|quasi| Value::from(quasi.as_str())).collect();
                let raw = self.array(raw);
                if let Value::Object(strings) = &strings {
                    strings.borrow_mut().define("raw", Property::hidden(raw));
                }
                let mut arguments = vec![strings];
                for expression in expressions {
                    arguments.push(self.evaluate(expression, scope)?);
                }
                if !function.is_callable() {
                    let text = self.source_text(tag.span).trim().to_string();
                    return Err(self.throw(ErrorKind::Type, format!("{text} is not a function")));
                }
                self.call(&function, this, &arguments)
            }
            Expression::Boolean(boolean) => Ok(Value::Boolean(*boolean)),
            Expression::Null => Ok(Value::Null),
            Expression::This => Ok(scope.context().map(|context| context.this.clone()).unwrap_or_default()),
            Expression::Identifier(name) => self.lookup(name, scope),
            Expression::Array(elements) => {
                let items = self.arguments(elements, scope)?;
                Ok(self.array(items))
            }
            Expression::Object(properties) => self.object_literal(properties, scope),
            Expression::Function(function) => {
                let kind = if function.is_arrow {
                    ClosureKind::Arrow
                } else {
                    ClosureKind::Normal
                };
                Ok(self.closure(function, scope, kind, None))
            }
            Expression::Unary { operator, operand } => self.unary(*operator, operand, scope),
            Expression::Update {
                operator,
                prefix,
                target,
            } => {
                let reference = self.reference(target, scope)?;
                let current = self.get_reference(&reference, scope)?;
                let old = self.to_number(&current)?;
                let new = match operator {
                    UpdateOperator::Increment => old + 1.0,
                    UpdateOperator::Decrement => old - 1.0,
                };
                self.put_reference(&reference, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expression::Binary { operator, left, right } => {
                let left = self.evaluate(left, scope)?;
                let right = self.evaluate(right, scope)?;
                self.binary(*operator, &left, &right)
            }
            Expression::Logical { operator, left, right } => {
                let left = self.evaluate(left, scope)?;
                if short_circuits(*operator, &left) {
                    return Ok(left);
                }
                self.evaluate(right, scope)
            }
            Expression::Assign {
                operator,
                target,
                value,
            } => self.assign(*operator, target, value, scope),
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.evaluate(test, scope)?.is_truthy() {
                    self.evaluate(consequent, scope)
                } else {
                    self.evaluate(alternate, scope)
                }
            }
            Expression::Call { .. } | Expression::Member { .. } => Ok(self.chain(expression, scope)?.unwrap_or_default()),
            Expression::New { callee, arguments } => {
                let constructor = self.evaluate(callee, scope)?;
                let arguments = self.arguments(arguments, scope)?;
                if !self.is_constructor(&constructor) {
                    let text = self.source_text(callee.span).to_string();
                    return Err(self.throw(ErrorKind::Type, format!("{text} is not a constructor")));
                }
                self.construct(&constructor, &arguments)
            }
            Expression::SuperCall(arguments) => self.super_call(arguments, scope),
            Expression::SuperMember(name) => {
                let home = self.super_home(scope)?;
                self.get(&home, &PropertyKey::from(name.as_str()))
            }
            Expression::Sequence(expressions) => {
                let mut last = Value::Undefined;
                for expression in expressions {
                    last = self.evaluate(expression, scope)?;
                }
                Ok(last)
            }
            Expression::Await(argument) => {
                let value = self.evaluate(argument, scope)?;
                match builtins::awaited(value) {
                    Awaited::Value(value) => Ok(value),
                    Awaited::Thrown(reason) => Err(Interrupt::Throw(reason)),
                    Awaited::Pending => Err(Interrupt::Suspend),
                }
            }
            Expression::TypeAssertion { expression, .. } => self.evaluate(expression, scope),
        }
    }

    pub(super) fn arguments(&mut self, arguments: &[Argument], scope: &ScopeRef) -> Result<Vec<Value>, Interrupt> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match argument {
                Argument::Expression(expression) => values.push(self.evaluate(expression, scope)?),
                Argument::Spread(expression) => {
                    let spread = self.evaluate(expression, scope)?;
                    values.extend(self.iterate(&spread)?);
                }
            }
        }
        Ok(values)
    }

    fn property_key(&mut self, key: &parser::PropertyKey, scope: &ScopeRef) -> Result<PropertyKey, Interrupt> {
        match key {
            parser::PropertyKey::Named(name) => Ok(PropertyKey::from(name.as_str())),
            parser::PropertyKey::Computed(expression) => {
                let key = self.evaluate(expression, scope)?;
                self.to_property_key(&key)
            }
        }
    }

    fn member_key(&mut self, property: &MemberProperty, scope: &ScopeRef) -> Result<PropertyKey, Interrupt> {
        match property {
            MemberProperty::Named(name) => Ok(PropertyKey::from(name.as_str())),
            MemberProperty::Computed(expression) => {
                let key = self.evaluate(expression, scope)?;
                self.to_property_key(&key)
            }
        }
    }

    fn object_literal(&mut self, properties: &[ObjectProperty], scope: &ScopeRef) -> Result<Value, Interrupt> {
        let object = self.object();
        for property in properties {
            match property {
                ObjectProperty::KeyValue { key, value } => {
                    let key = self.property_key(key, scope)?;
                    let value = self.evaluate(value, scope)?;
                    self.name_function(&value, &key.to_string());
                    object.borrow_mut().define(key, Property::enumerable(value));
                }
                ObjectProperty::Shorthand(name) => {
                    let value = self.lookup(name, scope)?;
                    object.borrow_mut().define(name.as_str(), Property::enumerable(value));
                }
                ObjectProperty::Method { key, function, kind } => {
                    let key = self.property_key(key, scope)?;
                    let method = self.closure(function, scope, ClosureKind::Method, Some(object.clone()));
                    self.name_function(&method, &method_name(&key, *kind));
                    define_method(&object, key, method, *kind, true);
                }
                ObjectProperty::Spread(expression) => {
                    let source = self.evaluate(expression, scope)?;
                    self.copy_data_properties(&object, &source)?;
                }
            }
        }
        Ok(Value::Object(object))
    }

    /// Own enumerable properties of `source` onto `target`, as spread does.
    pub(super) fn copy_data_properties(&mut self, target: &ObjectRef, source: &Value) -> Result<(), Interrupt> {
        match source {
            Value::Object(object) => {
                let keys = object.borrow().enumerable_keys();
                for key in keys {
                    let value = self.get(source, &key)?;
                    target.borrow_mut().define(key, Property::enumerable(value));
                }
            }
            Value::String(text) => {
                for (index, character) in text.chars().enumerate() {
                    target
                        .borrow_mut()
                        .define(index, Property::enumerable(Value::from(character.to_string())));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn unary(&mut self, operator: UnaryOperator, operand: &Spanned<Expression>, scope: &ScopeRef) -> Result<Value, Interrupt> {
        match operator {
            UnaryOperator::Typeof => {
                if let Expression::Identifier(name) = &operand.node
                    && matches!(scope.lookup(name), Lookup::Missing)
                {
                    return Ok(Value::from("undefined"));
                }
                let value = self.evaluate(operand, scope)?;
                Ok(Value::from(value.type_of()))
            }
            UnaryOperator::Delete => match &operand.node {
                Expression::Member { object, property, .. } => {
                    let target = self.evaluate(object, scope)?;
                    let key = self.member_key(property, scope)?;
                    self.delete(&target, &key).map(Value::Boolean)
                }
                _ => {
                    self.evaluate(operand, scope)?;
                    Ok(Value::Boolean(true))
                }
            },
            UnaryOperator::Not => Ok(Value::Boolean(!self.evaluate(operand, scope)?.is_truthy())),
            UnaryOperator::Negate => {
                let value = self.evaluate(operand, scope)?;
                Ok(Value::Number(-self.to_number(&value)?))
            }
            UnaryOperator::Plus => {
                let value = self.evaluate(operand, scope)?;
                Ok(Value::Number(self.to_number(&value)?))
            }
            UnaryOperator::BitwiseNot => {
                let value = self.evaluate(operand, scope)?;
                Ok(Value::Number(f64::from(!self.to_int32(&value)?)))
            }
            UnaryOperator::Void => {
                self.evaluate(operand, scope)?;
                Ok(Value::Undefined)
            }
        }
    }

    fn reference(&mut self, target: &Spanned<Expression>, scope: &ScopeRef) -> Result<Reference, Interrupt> {
        match &target.node {
            Expression::Identifier(name) => Ok(Reference::Binding(name.clone())),
            Expression::Member { object, property, .. } => {
                let object = self.evaluate(object, scope)?;
                let key = self.member_key(property, scope)?;
                Ok(Reference::Property(object, key))
            }
            Expression::SuperMember(name) => {
                let this = scope.context().map(|context| context.this.clone()).unwrap_or_default();
                Ok(Reference::Property(this, PropertyKey::from(name.as_str())))
            }
            Expression::TypeAssertion { expression, .. } => self.reference(expression, scope),
            _ => Err(self.throw(ErrorKind::Syntax, "Invalid left-hand side in assignment")),
        }
    }

    fn get_reference(&mut self, reference: &Reference, scope: &ScopeRef) -> Result<Value, Interrupt> {
        match reference {
            Reference::Binding(name) => self.lookup(name, scope),
            Reference::Property(object, key) => self.get(object, key),
        }
    }

    fn put_reference(&mut self, reference: &Reference, value: Value, scope: &ScopeRef) -> Result<(), Interrupt> {
        match reference {
            Reference::Binding(name) => self.assign_binding(name, value, scope),
            Reference::Property(object, key) => self.set(object, key.clone(), value),
        }
    }

    fn assign(
        &mut self,
        operator: AssignOperator,
        target: &Spanned<Expression>,
        value: &Spanned<Expression>,
        scope: &ScopeRef,
    ) -> Result<Value, Interrupt> {
        match operator {
            AssignOperator::Assign => {
                if matches!(target.node, Expression::Array(_) | Expression::Object(_)) {
                    let value = self.evaluate(value, scope)?;
                    self.assign_pattern(target, value.clone(), scope)?;
                    return Ok(value);
                }
                let reference = self.reference(target, scope)?;
                let value = self.evaluate(value, scope)?;
                if let Reference::Binding(name) = &reference {
                    self.name_function(&value, name);
                }
                self.put_reference(&reference, value.clone(), scope)?;
                Ok(value)
            }
            AssignOperator::Arithmetic(operator) => {
                let reference = self.reference(target, scope)?;
                let current = self.get_reference(&reference, scope)?;
                let right = self.evaluate(value, scope)?;
                let result = self.binary(operator, &current, &right)?;
                self.put_reference(&reference, result.clone(), scope)?;
                Ok(result)
            }
            AssignOperator::Logical(operator) => {
                let reference = self.reference(target, scope)?;
                let current = self.get_reference(&reference, scope)?;
                if short_circuits(operator, &current) {
                    return Ok(current);
                }
                let value = self.evaluate(value, scope)?;
                self.put_reference(&reference, value.clone(), scope)?;
                Ok(value)
            }
        }
    }

    /// Destructuring assignment whose target is written as an array or object literal.
    fn assign_pattern(&mut self, target: &Spanned<Expression>, value: Value, scope: &ScopeRef) -> Result<(), Interrupt> {
        match &target.node {
            Expression::Array(elements) => {
                let items = self.iterate(&value)?;
                for (index, element) in elements.iter().enumerate() {
                    match element {
                        Argument::Expression(element) => {
                            let item = items.get(index).cloned().unwrap_or_default();
                            self.assign_pattern(element, item, scope)?;
                        }
                        Argument::Spread(element) => {
                            let remaining = items.get(index..).map(<[Value]>::to_vec).unwrap_or_default();
                            let remaining = self.array(remaining);
                            self.assign_pattern(element, remaining, scope)?;
                        }
                    }
                }
                Ok(())
            }
            Expression::Object(properties) => {
                if value.is_nullish() {
                    let found = self.describe(&value);
                    return Err(self.throw(
                        ErrorKind::Type,
                        format!("Cannot destructure '{found}' as it is {found}."),
                    ));
                }
                let mut used = Vec::new();
                for property in properties {
                    match property {
                        ObjectProperty::KeyValue { key, value: element } => {
                            let key = self.property_key(key, scope)?;
                            let item = self.get(&value, &key)?;
                            used.push(key);
                            self.assign_pattern(element, item, scope)?;
                        }
                        ObjectProperty::Shorthand(name) => {
                            let key = PropertyKey::from(name.as_str());
                            let item = self.get(&value, &key)?;
                            used.push(key);
                            self.assign_binding(name, item, scope)?;
                        }
                        ObjectProperty::Spread(element) => {
                            let remaining = self.object();
                            let keys = match &value {
                                Value::Object(object) => object.borrow().enumerable_keys(),
                                _ => Vec::new(),
                            };
                            for key in keys.into_iter().filter(|key| !used.contains(key)) {
                                let item = self.get(&value, &key)?;
                                remaining.borrow_mut().define(key, Property::enumerable(item));
                            }
                            self.assign_pattern(element, Value::Object(remaining), scope)?;
                        }
                        ObjectProperty::Method { .. } => {
                            return Err(self.throw(ErrorKind::Syntax, "Invalid destructuring assignment target"));
                        }
                    }
                }
                Ok(())
            }
            Expression::Assign {
                operator: AssignOperator::Assign,
                target,
                value: default,
            } => {
                let value = match value {
                    Value::Undefined => self.evaluate(default, scope)?,
                    value => value,
                };
                self.assign_pattern(target, value, scope)
            }
            _ => {
                let reference = self.reference(target, scope)?;
                self.put_reference(&reference, value, scope)
            }
        }
    }

    /// Member and call chains. `None` means an optional link short-circuited
    /// the rest of the chain.
    fn chain(&mut self, expression: &Spanned<Expression>, scope: &ScopeRef) -> Result<Option<Value>, Interrupt> {
        match &expression.node {
            Expression::Member {
                object,
                property,
                optional,
            } => {
                let Some(base) = self.chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, scope)?;
                self.get(&base, &key).map(Some)
            }
            Expression::Call {
                callee,
                arguments,
                optional,
            } => {
                let Some((this, function)) = self.callee(callee, scope)? else {
                    return Ok(None);
                };
                if *optional && function.is_nullish() {
                    return Ok(None);
                }
                let arguments = self.arguments(arguments, scope)?;
                if !function.is_callable() {
                    let text = self.source_text(callee.span).trim().to_string();
                    return Err(self.throw(ErrorKind::Type, format!("{text} is not a function")));
                }
                self.call(&function, this, &arguments).map(Some)
            }
            _ => self.evaluate(expression, scope).map(Some),
        }
    }

    /// The function a call invokes and the `this` it receives. `None` means
    /// an optional link short-circuited.
    fn callee(&mut self, callee: &Spanned<Expression>, scope: &ScopeRef) -> Result<Option<(Value, Value)>, Interrupt> {
        Ok(Some(match &callee.node {
            Expression::Member {
                object,
                property,
                optional,
            } => {
                let Some(base) = self.chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, scope)?;
                let function = self.get(&base, &key)?;
                (base, function)
            }
            Expression::SuperMember(name) => {
                let home = self.super_home(scope)?;
                let function = self.get(&home, &PropertyKey::from(name.as_str()))?;
                let this = scope.context().map(|context| context.this.clone()).unwrap_or_default();
                (this, function)
            }
            _ => {
                let Some(function) = self.chain(callee, scope)? else {
                    return Ok(None);
                };
                (Value::Undefined, function)
            }
        }))
    }

    /// The object `super.x` reads from.
    fn super_home(&mut self, scope: &ScopeRef) -> Result<Value, Interrupt> {
        let home = scope
            .context()
            .and_then(|context| context.home_object.clone())
            .and_then(|home| home.borrow().prototype.clone());
        match home {
            Some(home) => Ok(Value::Object(home)),
            None => Err(self.throw(ErrorKind::Syntax, "'super' keyword unexpected here")),
        }
    }

    fn super_call(&mut self, arguments: &[Argument], scope: &ScopeRef) -> Result<Value, Interrupt> {
        let context = scope.context();
        let class = context.as_ref().and_then(|context| context.class.clone());
        let parent = class.as_ref().and_then(|class| match &class.borrow().kind {
            ObjectKind::Function(Function::Class(class)) => class.parent.clone(),
            _ => None,
        });
        let (Some(context), Some(class), Some(parent)) = (context, class, parent) else {
            return Err(self.throw(ErrorKind::Syntax, "'super' keyword unexpected here"));
        };
        let Value::Object(this) = context.this.clone() else {
            return Err(self.throw(ErrorKind::Syntax, "'super' keyword unexpected here"));
        };
        let arguments = self.arguments(arguments, scope)?;
        self.construct_into(&parent, &this, &arguments)?;
        self.initialize_fields(&class, &this)?;
        Ok(Value::Undefined)
    }

    // Classes.

    fn evaluate_class(&mut self, class: &Rc<parser::Class>, scope: &ScopeRef) -> Result<ObjectRef, Interrupt> {
        let parent = match &class.super_class {
            Some(super_class) => {
                let parent = self.evaluate(super_class, scope)?;
                match parent {
                    Value::Null => None,
                    Value::Object(object) if self.is_constructor(&Value::Object(object.clone())) => Some(object),
                    other => {
                        let found = self.describe(&other);
                        return Err(self.throw(
                            ErrorKind::Type,
                            format!("Class extends value {found} is not a constructor or null"),
                        ));
                    }
                }
            }
            None => None,
        };
        let prototype_parent = match &parent {
            Some(parent) => match self.get(&Value::Object(parent.clone()), &PropertyKey::from("prototype"))? {
                Value::Object(prototype) => Some(prototype),
                _ => None,
            },
            None => Some(self.realm.object_prototype.clone()),
        };
        let prototype = self.allocate(Object::new(prototype_parent, ObjectKind::Ordinary));
        let class_scope = Scope::block(scope);
        if let Some(name) = &class.name {
            class_scope.declare(name, None, false);
        }
        let mut constructor = Object::new(
            Some(parent.clone().unwrap_or_else(|| self.realm.function_prototype.clone())),
            ObjectKind::Function(Function::Class(ClassFunction {
                class: class.clone(),
                scope: class_scope.clone(),
                parent,
                prototype: prototype.clone(),
            })),
        );
        constructor.define("name", Property::hidden(Value::from(class.name.clone().unwrap_or_default())));
        constructor.define("prototype", Property::hidden(Value::Object(prototype.clone())));
        let constructor = self.allocate(constructor);
        prototype
            .borrow_mut()
            .define("constructor", Property::hidden(Value::Object(constructor.clone())));

        for member in &class.members {
            if let ClassMemberKind::Method { key, function, kind } = &member.kind {
                let home = if member.is_static { &constructor } else { &prototype };
                let key = self.property_key(key, &class_scope)?;
                let method = self.closure(function, &class_scope, ClosureKind::Method, Some(home.clone()));
                self.name_function(&method, &method_name(&key, *kind));
                define_method(home, key, method, *kind, false);
            }
        }
        if let Some(name) = &class.name {
            class_scope.initialize(name, Value::Object(constructor.clone()));
        }
        let static_scope = Scope::function(
            &class_scope,
            Some(FunctionContext {
                this: Value::Object(constructor.clone()),
                home_object: Some(constructor.clone()),
                class: None,
            }),
        );
        for member in &class.members {
            if let (true, ClassMemberKind::Field { key, value, .. }) = (member.is_static, &member.kind) {
                let key = self.property_key(key, &class_scope)?;
                let value = match value {
                    Some(value) => self.evaluate(value, &static_scope)?,
                    None => Value::Undefined,
                };
                constructor.borrow_mut().define(key, Property::enumerable(value));
            }
        }
        Ok(constructor)
    }

    fn initialize_fields(&mut self, class: &ObjectRef, this: &ObjectRef) -> Result<(), Interrupt> {
        let parts = match &class.borrow().kind {
            ObjectKind::Function(Function::Class(parts)) => parts.clone(),
            _ => return Ok(()),
        };
        let field_scope = Scope::function(
            &parts.scope,
            Some(FunctionContext {
                this: Value::Object(this.clone()),
                home_object: Some(parts.prototype.clone()),
                class: None,
            }),
        );
        for member in &parts.class.members {
            if let (false, ClassMemberKind::Field { key, value, .. }) = (member.is_static, &member.kind) {
                let key = self.property_key(key, &parts.scope)?;
                let value = match value {
                    Some(value) => self.evaluate(value, &field_scope)?,
                    None => Value::Undefined,
                };
                this.borrow_mut().define(key, Property::enumerable(value));
            }
        }
        Ok(())
    }

    // Calls.

    fn callable(object: &ObjectRef) -> Callable {
        match &object.borrow().kind {
            ObjectKind::Function(Function::Closure(closure)) => Callable::Closure(closure.clone()),
            ObjectKind::Function(Function::Native(native)) => Callable::Native(native.call),
            ObjectKind::Function(Function::Bound(bound)) => Callable::Bound(bound.clone()),
            ObjectKind::Function(Function::Class(class)) => {
                Callable::Class(class.class.name.clone().unwrap_or_default())
            }
            _ => Callable::None,
        }
    }

    pub fn call(&mut self, callee: &Value, this: Value, arguments: &[Value]) -> Result<Value, Interrupt> {
        let Some(object) = callee.as_object() else {
            let found = self.describe(callee);
            return Err(self.throw(ErrorKind::Type, format!("{found} is not a function")));
        };
        match Self::callable(object) {
            Callable::Closure(closure) => self.call_closure(object, closure, this, arguments, None),
            Callable::Native(call) => {
                // Natives recurse too, e.g. `String` of an array that contains itself.
                self.enter()?;
                let result = call(
                    self,
                    NativeCall {
                        this,
                        arguments,
                        callee: object,
                    },
                );
                self.depth -= 1;
                result
            }
            Callable::Bound(bound) => {
                let mut combined = bound.arguments.clone();
                combined.extend_from_slice(arguments);
                self.call(&Value::Object(bound.target), bound.this, &combined)
            }
            Callable::Class(name) => Err(self.throw(
                ErrorKind::Type,
                format!("Class constructor {name} cannot be invoked without 'new'"),
            )),
            Callable::None => {
                let found = self.describe(callee);
                Err(self.throw(ErrorKind::Type, format!("{found} is not a function")))
            }
        }
    }

    fn enter(&mut self) -> Result<(), Interrupt> {
        if self.depth >= self.limits.max_call_depth {
            return Err(self.throw(ErrorKind::Range, "Maximum call stack size exceeded"));
        }
        self.depth += 1;
        Ok(())
    }

    fn call_closure(
        &mut self,
        callee: &ObjectRef,
        closure: Closure,
        this: Value,
        arguments: &[Value],
        class: Option<ObjectRef>,
    ) -> Result<Value, Interrupt> {
        self.enter()?;
        let is_async = closure.function.is_async;
        let result = self.invoke(callee, closure, this, arguments, class);
        self.depth -= 1;
        if !is_async {
            return result;
        }
        let outcome = match result {
            Ok(value) => Awaited::Value(value),
            Err(Interrupt::Throw(reason)) => Awaited::Thrown(reason),
            Err(Interrupt::Suspend) => {
                self.pending_reactions += 1;
                Awaited::Pending
            }
            Err(halt) => return Err(halt),
        };
        Ok(builtins::settled(self, outcome))
    }

    fn invoke(
        &mut self,
        callee: &ObjectRef,
        closure: Closure,
        this: Value,
        arguments: &[Value],
        class: Option<ObjectRef>,
    ) -> Result<Value, Interrupt> {
        let function = closure.function;
        let context = (closure.kind != ClosureKind::Arrow).then(|| FunctionContext {
            this,
            home_object: closure.home_object,
            class,
        });
        let scope = Scope::function(&closure.scope, context);
        if closure.kind == ClosureKind::Normal
            && let Some(name) = &function.name
        {
            scope.declare(name, Some(Value::Object(callee.clone())), true);
        }
        if closure.kind != ClosureKind::Arrow {
            let list = self.array(arguments.to_vec());
            scope.declare("arguments", Some(list), true);
        }
        for (index, parameter) in function.parameters.iter().enumerate() {
            let value = if parameter.rest {
                let rest = arguments.get(index..).map(<[Value]>::to_vec).unwrap_or_default();
                self.array(rest)
            } else {
                match (arguments.get(index), &parameter.default) {
                    (Some(Value::Undefined) | None, Some(default)) => self.evaluate(default, &scope)?,
                    (Some(value), _) => value.clone(),
                    (None, None) => Value::Undefined,
                }
            };
            self.bind_pattern(&parameter.pattern, value, &scope, BindMode::Let)?;
        }
        match &function.body {
            FunctionBody::Block(statements) => {
                self.hoist_function(statements, &scope);
                match self.execute_statements(statements, &scope)? {
                    Completion::Return(value) => Ok(value),
                    _ => Ok(Value::Undefined),
                }
            }
            FunctionBody::Expression(expression) => self.evaluate(expression, &scope),
        }
    }

    pub fn is_constructor(&self, value: &Value) -> bool {
        let Some(object) = value.as_object() else {
            return false;
        };
        match &object.borrow().kind {
            ObjectKind::Function(Function::Closure(closure)) => {
                closure.kind == ClosureKind::Normal && !closure.function.is_async
            }
            ObjectKind::Function(Function::Native(native)) => native.construct.is_some(),
            ObjectKind::Function(Function::Bound(bound)) => self.is_constructor(&Value::Object(bound.target.clone())),
            ObjectKind::Function(Function::Class(_)) => true,
            _ => false,
        }
    }

    /// `new callee(...arguments)`.
    pub fn construct(&mut self, callee: &Value, arguments: &[Value]) -> Result<Value, Interrupt> {
        let Some(constructor) = callee.as_object().filter(|_| self.is_constructor(callee)).cloned() else {
            let found = self.describe(callee);
            return Err(self.throw(ErrorKind::Type, format!("{found} is not a constructor")));
        };
        let prototype = match self.get(callee, &PropertyKey::from("prototype"))? {
            Value::Object(prototype) => prototype,
            _ => self.realm.object_prototype.clone(),
        };
        let this = self.allocate(Object::new(Some(prototype), ObjectKind::Ordinary));
        match self.construct_into(&constructor, &this, arguments)? {
            Value::Object(returned) => Ok(Value::Object(returned)),
            _ => Ok(Value::Object(this)),
        }
    }

    /// Runs a constructor against an already allocated `this`.
    fn construct_into(&mut self, constructor: &ObjectRef, this: &ObjectRef, arguments: &[Value]) -> Result<Value, Interrupt> {
        let native_construct = match &constructor.borrow().kind {
            ObjectKind::Function(Function::Native(native)) => native.construct,
            _ => None,
        };
        if let Some(construct) = native_construct {
            return construct(
                self,
                NativeCall {
                    this: Value::Object(this.clone()),
                    arguments,
                    callee: constructor,
                },
            );
        }
        match Self::callable(constructor) {
            Callable::Closure(closure) => {
                self.call_closure(constructor, closure, Value::Object(this.clone()), arguments, None)
            }
            Callable::Bound(bound) => {
                let mut combined = bound.arguments.clone();
                combined.extend_from_slice(arguments);
                self.construct_into(&bound.target, this, &combined)
            }
            Callable::Class(_) => self.construct_class(constructor, this, arguments),
            Callable::Native(_) | Callable::None => {
                let found = self.describe(&Value::Object(constructor.clone()));
                Err(self.throw(ErrorKind::Type, format!("{found} is not a constructor")))
            }
        }
    }

    fn construct_class(&mut self, constructor: &ObjectRef, this: &ObjectRef, arguments: &[Value]) -> Result<Value, Interrupt> {
        let parts = match &constructor.borrow().kind {
            ObjectKind::Function(Function::Class(parts)) => parts.clone(),
            _ => return Ok(Value::Undefined),
        };
        match parts.class.constructor() {
            Some(function) => {
                if parts.parent.is_none() {
                    self.initialize_fields(constructor, this)?;
                }
                let closure = Closure {
                    function: function.clone(),
                    scope: parts.scope.clone(),
                    kind: ClosureKind::Method,
                    home_object: Some(parts.prototype.clone()),
                };
                self.call_closure(
                    constructor,
                    closure,
                    Value::Object(this.clone()),
                    arguments,
                    Some(constructor.clone()),
                )
            }
            None => {
                if let Some(parent) = &parts.parent {
                    self.enter()?;
                    let result = self.construct_into(parent, this, arguments);
                    self.depth -= 1;
                    result?;
                }
                self.initialize_fields(constructor, this)?;
                Ok(Value::Undefined)
            }
        }
    }

    /// Turns a value that escaped the program into the error it reports as.
    pub fn runtime_error(&mut self, thrown: &Value) -> RuntimeError {
        if thrown.is_nullish() {
            return RuntimeError::new("Error", "Unknown error");
        }
        let kind = self
            .get(thrown, &PropertyKey::from("constructor"))
            .and_then(|constructor| match constructor {
                Value::Object(_) => self.get(&constructor, &PropertyKey::from("name")),
                _ => Ok(Value::Undefined),
            })
            .ok()
            .and_then(|name| match name {
                Value::String(name) if !name.is_empty() => Some(name.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| "Error".to_string());
        let message = self
            .get(thrown, &PropertyKey::from("message"))
            .ok()
            .filter(|message| !message.is_nullish())
            .and_then(|message| self.to_string(&message).ok())
            .filter(|message| !message.is_empty())
            .map(|message| message.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        RuntimeError::new(kind, message)
    }
}

fn short_circuits(operator: LogicalOperator, left: &Value) -> bool {
    match operator {
        LogicalOperator::And => !left.is_truthy(),
        LogicalOperator::Or => left.is_truthy(),
        LogicalOperator::Nullish => !left.is_nullish(),
    }
}

/// Whether a loop keeps going after its body completed with `completion`.
fn loop_control(completion: Completion, labels: &[&str]) -> ControlFlow<Completion> {
    match completion {
        Completion::Normal | Completion::Continue(None) => ControlFlow::Continue(()),
        Completion::Continue(Some(label)) if labels.contains(&label.as_str()) => ControlFlow::Continue(()),
        Completion::Break(None) => ControlFlow::Break(Completion::Normal),
        Completion::Break(Some(label)) if labels.contains(&label.as_str()) => ControlFlow::Break(Completion::Normal),
        abrupt => ControlFlow::Break(abrupt),
    }
}

fn method_name(key: &PropertyKey, kind: MethodKind) -> String {
    match kind {
        MethodKind::Method => key.to_string(),
        MethodKind::Getter => format!("get {key}"),
        MethodKind::Setter => format!("set {key}"),
    }
}

/// Defines a method on `target`. A getter and a setter of one key share an accessor.
fn define_method(target: &ObjectRef, key: PropertyKey, method: Value, kind: MethodKind, enumerable: bool) {
    let mut target = target.borrow_mut();
    let mut accessor = target
        .properties
        .get(&key)
        .and_then(|property| property.accessor.clone())
        .unwrap_or_default();
    match kind {
        MethodKind::Method => return target.define(key, Property::new(method, enumerable)),
        MethodKind::Getter => accessor.get = Some(method),
        MethodKind::Setter => accessor.set = Some(method),
    }
    target.define(key, Property::accessor(accessor, enumerable));
}

fn pattern_names(pattern: &Pattern, names: &mut Vec<String>) {
    match pattern {
        Pattern::Identifier(name) => names.push(name.clone()),
        Pattern::Object { properties, rest } => {
            for property in properties {
                pattern_names(&property.value, names);
            }
            names.extend(rest.iter().cloned());
        }
        Pattern::Array { elements, rest } => {
            for element in elements.iter().flatten() {
                pattern_names(&element.pattern, names);
            }
            if let Some(rest) = rest {
                pattern_names(rest, names);
            }
        }
    }
}

/// `var` names declared anywhere in a function body, outside nested functions.
fn var_names(statements: &[Spanned<Statement>], names: &mut Vec<String>) {
    for statement in statements {
        var_names_in(&statement.node, names);
    }
}

fn var_names_in(statement: &Statement, names: &mut Vec<String>) {
    let declared = |declaration: &VariableDeclaration, names: &mut Vec<String>| {
        if declaration.kind == DeclarationKind::Var {
            for declarator in &declaration.declarators {
                pattern_names(&declarator.pattern, names);
            }
        }
    };
    match statement {
        Statement::Variable(declaration) => declared(declaration, names),
        Statement::Enum(declaration) => names.push(declaration.name.clone()),
        Statement::Labeled { body, .. } => var_names_in(&body.node, names),
        Statement::If {
            consequent, alternate, ..
        } => {
            var_names_in(&consequent.node, names);
            if let Some(alternate) = alternate {
                var_names_in(&alternate.node, names);
            }
        }
        Statement::For { init, body, .. } => {
            if let Some(ForInit::Variable(declaration)) = init {
                declared(declaration, names);
            }
            var_names_in(&body.node, names);
        }
        Statement::ForOf { binding, body, .. } | Statement::ForIn { binding, body, .. } => {
            if binding.kind == Some(DeclarationKind::Var) {
                pattern_names(&binding.pattern, names);
            }
            var_names_in(&body.node, names);
        }
        Statement::While { body, .. } | Statement::DoWhile { body, .. } => var_names_in(&body.node, names),
        Statement::Block(statements) => var_names(statements, names),
        Statement::Try {
            block,
            handler,
            finalizer,
        } => {
            var_names(block, names);
            if let Some(handler) = handler {
                var_names(&handler.body, names);
            }
            if let Some(finalizer) = finalizer {
                var_names(finalizer, names);
            }
        }
        Statement::Switch { cases, .. } => {
            for case in cases {
                var_names(&case.body, names);
            }
        }
        _ => {}
    }
}
