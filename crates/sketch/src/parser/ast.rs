use super::{Span, Spanned};
use std::rc::Rc;

pub type Program = Vec<Spanned<Statement>>;

/// Byte range of type-only syntax, including its leading `:`, `?`, `!`,
/// `as`, `<` or modifier keyword.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeAnnotation {
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Expression(Spanned<Expression>),
    Variable(VariableDeclaration),
    Function(Rc<Function>),
    Class(Rc<Class>),
    Return(Option<Spanned<Expression>>),
    If {
        test: Spanned<Expression>,
        consequent: Box<Spanned<Statement>>,
        alternate: Option<Box<Spanned<Statement>>>,
    },
    For {
        init: Option<ForInit>,
        test: Option<Spanned<Expression>>,
        update: Option<Spanned<Expression>>,
        body: Box<Spanned<Statement>>,
    },
    ForOf {
        binding: ForBinding,
        iterable: Spanned<Expression>,
        body: Box<Spanned<Statement>>,
    },
    ForIn {
        binding: ForBinding,
        object: Spanned<Expression>,
        body: Box<Spanned<Statement>>,
    },
    While {
        test: Spanned<Expression>,
        body: Box<Spanned<Statement>>,
    },
    DoWhile {
        body: Box<Spanned<Statement>>,
        test: Spanned<Expression>,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Labeled {
        label: String,
        body: Box<Spanned<Statement>>,
    },
    Block(Vec<Spanned<Statement>>),
    Throw(Spanned<Expression>),
    Try {
        block: Vec<Spanned<Statement>>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Spanned<Statement>>>,
    },
    Switch {
        discriminant: Spanned<Expression>,
        cases: Vec<SwitchCase>,
    },
    Enum(Rc<Enum>),
    Empty,
    // `type`, `interface`, `declare` and overload signatures.
    TypeOnly,
}

/// `enum` and `const enum`, which lower to a plain object.
#[derive(Debug, Clone)]
pub struct Enum {
    pub name: String,
    pub members: Vec<EnumMember>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: String,
    pub init: Option<Spanned<Expression>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Const,
    Let,
    Var,
}

#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    pub kind: DeclarationKind,
    pub declarators: Vec<Declarator>,
}

#[derive(Debug, Clone)]
pub struct Declarator {
    pub pattern: Pattern,
    pub annotation: Option<TypeAnnotation>,
    pub init: Option<Spanned<Expression>>,
}

#[derive(Debug, Clone)]
pub enum ForInit {
    Variable(VariableDeclaration),
    Expression(Spanned<Expression>),
}

#[derive(Debug, Clone)]
pub struct ForBinding {
    pub kind: Option<DeclarationKind>,
    pub pattern: Pattern,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub parameter: Option<Pattern>,
    pub annotation: Option<TypeAnnotation>,
    pub body: Vec<Spanned<Statement>>,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    // None for `default:`.
    pub test: Option<Spanned<Expression>>,
    pub body: Vec<Spanned<Statement>>,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: Option<String>,
    pub type_parameters: Option<TypeAnnotation>,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<TypeAnnotation>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    pub is_async: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Vec<Spanned<Statement>>),
    Expression(Box<Spanned<Expression>>),
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub pattern: Pattern,
    pub annotation: Option<TypeAnnotation>,
    pub default: Option<Spanned<Expression>>,
    pub rest: bool,
    // Accessibility modifiers of a constructor parameter property.
    pub property: Option<TypeAnnotation>,
}

impl Parameter {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            pattern: Pattern::Identifier(name.into()),
            annotation: None,
            default: None,
            rest: false,
            property: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Class {
    pub name: Option<String>,
    pub type_parameters: Option<TypeAnnotation>,
    pub super_class: Option<Spanned<Expression>>,
    pub super_type_arguments: Option<TypeAnnotation>,
    pub implements: Option<TypeAnnotation>,
    pub members: Vec<ClassMember>,
    pub span: Span,
}

impl Class {
    pub fn constructor(&self) -> Option<&Rc<Function>> {
        self.members.iter().find_map(|member| match &member.kind {
            ClassMemberKind::Constructor(function) => Some(function),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClassMember {
    pub modifiers: Vec<TypeAnnotation>,
    pub is_static: bool,
    pub kind: ClassMemberKind,
}

#[derive(Debug, Clone)]
pub enum ClassMemberKind {
    Constructor(Rc<Function>),
    Method {
        key: PropertyKey,
        function: Rc<Function>,
        kind: MethodKind,
    },
    Field {
        key: PropertyKey,
        annotation: Option<TypeAnnotation>,
        value: Option<Spanned<Expression>>,
    },
    // Index signatures and method overload signatures.
    Signature(TypeAnnotation),
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Identifier(String),
    Object {
        properties: Vec<ObjectPatternProperty>,
        rest: Option<String>,
    },
    Array {
        // None marks a hole.
        elements: Vec<Option<PatternElement>>,
        rest: Option<Box<Pattern>>,
    },
}

#[derive(Debug, Clone)]
pub struct ObjectPatternProperty {
    pub key: PropertyKey,
    pub value: Pattern,
    pub default: Option<Spanned<Expression>>,
}

#[derive(Debug, Clone)]
pub struct PatternElement {
    pub pattern: Pattern,
    pub default: Option<Spanned<Expression>>,
}

#[derive(Debug, Clone)]
pub enum PropertyKey {
    Named(String),
    Computed(Box<Spanned<Expression>>),
}

#[derive(Debug, Clone)]
pub enum Expression {
    Number(f64),
    String(String),
    Template {
        quasis: Vec<String>,
        expressions: Vec<Spanned<Expression>>,
    },
    Regex {
        pattern: String,
        flags: String,
    },
    Boolean(bool),
    Null,
    This,
    Identifier(String),
    Array(Vec<Argument>),
    Object(Vec<ObjectProperty>),
    Function(Rc<Function>),
    Unary {
        operator: UnaryOperator,
        operand: Box<Spanned<Expression>>,
    },
    Update {
        operator: UpdateOperator,
        prefix: bool,
        target: Box<Spanned<Expression>>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Spanned<Expression>>,
        right: Box<Spanned<Expression>>,
    },
    Logical {
        operator: LogicalOperator,
        left: Box<Spanned<Expression>>,
        right: Box<Spanned<Expression>>,
    },
    Assign {
        operator: AssignOperator,
        target: Box<Spanned<Expression>>,
        value: Box<Spanned<Expression>>,
    },
    Conditional {
        test: Box<Spanned<Expression>>,
        consequent: Box<Spanned<Expression>>,
        alternate: Box<Spanned<Expression>>,
    },
    Call {
        callee: Box<Spanned<Expression>>,
        arguments: Vec<Argument>,
        optional: bool,
    },
    New {
        callee: Box<Spanned<Expression>>,
        arguments: Vec<Argument>,
    },
    Member {
        object: Box<Spanned<Expression>>,
        property: MemberProperty,
        optional: bool,
    },
    // `tag`a${b}c``, with cooked and raw string parts.
    TaggedTemplate {
        tag: Box<Spanned<Expression>>,
        quasis: Vec<String>,
        raw: Vec<String>,
        expressions: Vec<Spanned<Expression>>,
    },
    Sequence(Vec<Spanned<Expression>>),
    Await(Box<Spanned<Expression>>),
    SuperCall(Vec<Argument>),
    SuperMember(String),
    // `x as T`, `x satisfies T` and `x!`.
    TypeAssertion {
        expression: Box<Spanned<Expression>>,
        annotation: TypeAnnotation,
    },
}

impl Expression {
    pub fn is_assignment(&self) -> bool {
        match self {
            Self::Assign { .. } | Self::Update { .. } => true,
            // `i++, j--`
            Self::Sequence(expressions) => expressions.iter().all(|expression| expression.node.is_assignment()),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Argument {
    Expression(Spanned<Expression>),
    Spread(Spanned<Expression>),
}

#[derive(Debug, Clone)]
pub enum ObjectProperty {
    KeyValue {
        key: PropertyKey,
        value: Spanned<Expression>,
    },
    Shorthand(String),
    Method {
        key: PropertyKey,
        function: Rc<Function>,
        kind: MethodKind,
    },
    Spread(Spanned<Expression>),
}

#[derive(Debug, Clone)]
pub enum MemberProperty {
    Named(String),
    Computed(Box<Spanned<Expression>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    Plus,
    BitwiseNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Exponent,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    In,
    Instanceof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOperator {
    Assign,
    Arithmetic(BinaryOperator),
    Logical(LogicalOperator),
}
