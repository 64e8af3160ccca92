use chumsky::error::RichReason;
use chumsky::{input::ValueInput, pratt::*, prelude::*};
use std::fmt;
use std::rc::Rc;

mod ast;
pub use ast::*;

mod lexer;
pub use lexer::{Keyword, Token, lexer};

mod literal;
pub use literal::{number_to_string, split_template, unescape};

mod semicolons;
pub use semicolons::insert_semicolons;

mod source;
pub use source::SourceCode;

mod visit;
pub use visit::*;

pub use chumsky::prelude::{Input, Parser};

pub type Span = SimpleSpan;
pub type ParseError<'code, T> = Rich<'code, T, Span>;

type Extra<'code> = extra::Err<ParseError<'code, Token<'code>>>;

#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
    /// 1-based.
    pub line: usize,
    /// 1-based, in characters.
    pub column: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.message, self.line, self.column)
    }
}

fn describe<T: fmt::Display>(error: &ParseError<'_, T>) -> String {
    match error.reason() {
        RichReason::Custom(message) => message.to_string(),
        _ => match error.found() {
            Some(found) => format!("Unexpected token '{found}'"),
            None => "Unexpected end of input".to_string(),
        },
    }
}

/// Lexes, inserts semicolons and parses a whole script.
pub fn parse_program(source: &str) -> Result<Program, Vec<SyntaxError>> {
    parse_at(source, 0).and_then(check_await).map_err(|errors| {
        let source = SourceCode::new(source);
        errors
            .into_iter()
            .map(|(message, span)| {
                let (line, column) = source.line_column(span.start);
                SyntaxError {
                    message,
                    span,
                    line,
                    column,
                }
            })
            .collect()
    })
}

/// Scripts run as a plain function body, so `await` needs an async function.
#[derive(Default)]
struct AwaitPlacement {
    in_async: Vec<bool>,
    errors: Vec<(String, Span)>,
}

impl Visitor for AwaitPlacement {
    fn visit_function(&mut self, function: &Function) {
        self.in_async.push(function.is_async);
        walk_function(self, function);
        self.in_async.pop();
    }

    fn visit_expression(&mut self, expression: &Spanned<Expression>) {
        if matches!(expression.node, Expression::Await(_)) && !self.in_async.last().copied().unwrap_or(false) {
            self.errors.push((
                "await is only valid in async functions and the top level bodies of modules".to_string(),
                expression.span,
            ));
        }
        walk_expression(self, expression);
    }
}

fn check_await(program: Program) -> Result<Program, Vec<(String, Span)>> {
    let mut placement = AwaitPlacement::default();
    walk_program(&mut placement, &program);
    if placement.errors.is_empty() {
        Ok(program)
    } else {
        Err(placement.errors)
    }
}

// Spans are shifted by `offset` so embedded template expressions keep
// positions relative to the enclosing script.
fn parse_at(source: &str, offset: usize) -> Result<Program, Vec<(String, Span)>> {
    let tokens = lexer().parse(source).into_result().map_err(|errors| {
        errors
            .iter()
            .map(|error| ("Invalid or unexpected token".to_string(), shift(*error.span(), offset)))
            .collect::<Vec<_>>()
    })?;
    let tokens = insert_semicolons(tokens)
        .into_iter()
        .map(|token| Spanned {
            node: token.node,
            span: shift(token.span, offset),
        })
        .collect::<Vec<_>>();
    let end = offset + source.len();
    let input = tokens
        .as_slice()
        .map(Span::from(end..end), |Spanned { node, span }| (node, span));
    parser()
        .parse(input)
        .into_result()
        .map_err(|errors| errors.iter().map(|error| (describe(error), *error.span())).collect())
}

fn shift(span: Span, offset: usize) -> Span {
    let range = span.into_range();
    Span::from(range.start + offset..range.end + offset)
}

fn join(start: Span, end: Span) -> Span {
    Span::from(start.into_range().start..end.into_range().end)
}

struct TemplateParts {
    quasis: Vec<String>,
    raw: Vec<String>,
    expressions: Vec<Spanned<Expression>>,
}

fn parse_template(raw: &str, span: Span) -> Result<TemplateParts, String> {
    let (parts, sources) = split_template(raw)?;
    let body_start = span.into_range().start + 1;
    let expressions = sources
        .into_iter()
        .map(|(offset, source)| parse_embedded_expression(source, body_start + offset))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TemplateParts {
        quasis: parts.iter().map(|part| unescape(part)).collect(),
        raw: parts.into_iter().map(str::to_string).collect(),
        expressions,
    })
}

fn parse_embedded_expression(source: &str, offset: usize) -> Result<Spanned<Expression>, String> {
    let mut program = parse_at(source, offset).map_err(|errors| {
        errors
            .into_iter()
            .next()
            .map(|(message, _)| message)
            .unwrap_or_else(|| "Invalid template expression".to_string())
    })?;
    match (program.pop(), program.is_empty()) {
        (
            Some(Spanned {
                node: Statement::Expression(expression),
                ..
            }),
            true,
        ) => Ok(expression),
        _ => Err("Invalid template expression".to_string()),
    }
}

#[derive(Clone)]
enum Prefix {
    Unary(UnaryOperator),
    Update(UpdateOperator),
    Await,
}

#[derive(Clone)]
enum Postfix {
    Call(Vec<Argument>),
    OptionalCall(Vec<Argument>),
    Member(String),
    OptionalMember(String),
    Index(Spanned<Expression>),
    OptionalIndex(Spanned<Expression>),
    NonNull(TypeAnnotation),
    Update(UpdateOperator),
    Template {
        quasis: Vec<String>,
        raw: Vec<String>,
        expressions: Vec<Spanned<Expression>>,
    },
}

#[derive(Clone)]
enum ArrayPatternItem {
    Element(PatternElement),
    Rest(Pattern),
}

#[derive(Clone)]
enum ObjectPatternItem {
    Property(ObjectPatternProperty),
    Rest(String),
}

fn array_pattern(mut items: Vec<Option<ArrayPatternItem>>) -> Result<Pattern, String> {
    // `[a,]` and `[]` leave an empty trailing slot behind the last comma.
    if matches!(items.last(), Some(None)) {
        items.pop();
    }
    let mut elements = Vec::with_capacity(items.len());
    let mut rest = None;
    let count = items.len();
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Some(ArrayPatternItem::Rest(pattern)) if index + 1 == count => {
                rest = Some(Box::new(pattern));
            }
            Some(ArrayPatternItem::Rest(_)) => {
                return Err("Rest element must be last element".to_string());
            }
            Some(ArrayPatternItem::Element(element)) => elements.push(Some(element)),
            None => elements.push(None),
        }
    }
    Ok(Pattern::Array { elements, rest })
}

fn object_pattern(items: Vec<ObjectPatternItem>) -> Result<Pattern, String> {
    let mut properties = Vec::with_capacity(items.len());
    let mut rest = None;
    let count = items.len();
    for (index, item) in items.into_iter().enumerate() {
        match item {
            ObjectPatternItem::Rest(name) if index + 1 == count => rest = Some(name),
            ObjectPatternItem::Rest(_) => {
                return Err("Rest element must be last element".to_string());
            }
            ObjectPatternItem::Property(property) => properties.push(property),
        }
    }
    Ok(Pattern::Object { properties, rest })
}

pub fn parser<'code, I>() -> impl Parser<'code, I, Program, Extra<'code>> + Clone
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    let mut statement = Recursive::declare();
    let mut expression = Recursive::declare();
    let mut pattern = Recursive::declare();
    let mut type_expression = Recursive::declare();

    let semicolon = just(Token::Semicolon);
    let comma = just(Token::Comma);
    let colon = just(Token::Colon);
    let dot = just(Token::Dot);
    let question = just(Token::Question);
    let assign = just(Token::Assign);
    let arrow = just(Token::Arrow);
    let ellipsis = just(Token::Ellipsis);
    let bracket_round_open = just(Token::BracketRoundOpen);
    let bracket_round_close = just(Token::BracketRoundClose);
    let bracket_curly_open = just(Token::BracketCurlyOpen);
    let bracket_curly_close = just(Token::BracketCurlyClose);
    let bracket_square_open = just(Token::BracketSquareOpen);
    let bracket_square_close = just(Token::BracketSquareClose);
    let keyword = |keyword: Keyword| just(Token::Keyword(keyword));

    let identifier = select! { Token::Identifier(name) => name.to_string() };
    let async_keyword = select! { Token::Identifier("async") => () };
    let property_name = select! {
        Token::Identifier(name) => name.to_string(),
        Token::Keyword(keyword) => keyword.as_str().to_string(),
    };

    let property_key = choice((
        select! {
            Token::Identifier(name) => PropertyKey::Named(name.to_string()),
            Token::Keyword(keyword) => PropertyKey::Named(keyword.as_str().to_string()),
            Token::Text(raw) => PropertyKey::Named(unescape(raw)),
            Token::Number(number) => PropertyKey::Named(number_to_string(number)),
        },
        expression
            .clone()
            .delimited_by(bracket_square_open.clone(), bracket_square_close.clone())
            .map(|key| PropertyKey::Computed(Box::new(key))),
    ))
    .boxed();

    // Types only need to be recognized; erasure works on their spans.
    let type_parameters = identifier
        .clone()
        .then(keyword(Keyword::Extends).ignore_then(type_expression.clone()).or_not())
        .then(assign.clone().ignore_then(type_expression.clone()).or_not())
        .separated_by(comma.clone())
        .allow_trailing()
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(just(Token::Less), just(Token::Greater))
        .map_with(|_, extra| TypeAnnotation { span: extra.span() })
        .boxed();

    let type_arguments = type_expression
        .clone()
        .separated_by(comma.clone())
        .allow_trailing()
        .collect::<Vec<()>>()
        .delimited_by(just(Token::Less), just(Token::Greater))
        .map_with(|_, extra| TypeAnnotation { span: extra.span() })
        .boxed();

    type_expression.define({
        let optional_marker = question.clone().or_not();

        let reference = identifier
            .clone()
            .then(dot.clone().then(property_name.clone()).repeated())
            .then(type_arguments.clone().or_not())
            .ignored();

        let literal = select! {
            Token::Text(_) => (),
            Token::Template(_) => (),
            Token::Number(_) => (),
            Token::Keyword(Keyword::True) => (),
            Token::Keyword(Keyword::False) => (),
            Token::Keyword(Keyword::Null) => (),
            Token::Keyword(Keyword::Void) => (),
            Token::Keyword(Keyword::This) => (),
        };

        let negative_number = just(Token::Minus)
            .then(select! { Token::Number(_) => () })
            .ignored();

        let member_key = property_name
            .clone()
            .ignored()
            .or(select! { Token::Text(_) => (), Token::Number(_) => () });

        let function_type_parameter = ellipsis
            .clone()
            .or_not()
            .then(pattern.clone().ignored().or(keyword(Keyword::This).ignored()))
            .then(optional_marker.clone())
            .then(colon.clone().then(type_expression.clone()).or_not())
            .ignored();

        let function_type_parameters = function_type_parameter
            .separated_by(comma.clone())
            .allow_trailing()
            .collect::<Vec<()>>()
            .delimited_by(bracket_round_open.clone(), bracket_round_close.clone())
            .ignored()
            .boxed();

        let function_type = keyword(Keyword::New)
            .or_not()
            .then(type_parameters.clone().or_not())
            .then(function_type_parameters.clone())
            .then(arrow.clone())
            .then(type_expression.clone())
            .ignored();

        let index_signature = property_name
            .clone()
            .then(colon.clone())
            .then(type_expression.clone())
            .delimited_by(bracket_square_open.clone(), bracket_square_close.clone())
            .then(colon.clone())
            .then(type_expression.clone())
            .ignored();

        let method_signature = member_key
            .clone()
            .then(optional_marker.clone())
            .then(type_parameters.clone().or_not())
            .then(function_type_parameters)
            .then(colon.clone().then(type_expression.clone()).or_not())
            .ignored();

        let property_signature = select! { Token::Identifier("readonly") => () }
            .or_not()
            .then(member_key)
            .then(optional_marker.clone())
            .then(colon.clone().then(type_expression.clone()).or_not())
            .ignored();

        let object_type = choice((index_signature, method_signature, property_signature))
            .separated_by(semicolon.clone().or(comma.clone()))
            .allow_trailing()
            .collect::<Vec<()>>()
            .delimited_by(bracket_curly_open.clone(), bracket_curly_close.clone())
            .ignored();

        let tuple_element = ellipsis
            .clone()
            .or_not()
            .then(
                property_name
                    .clone()
                    .then(optional_marker.clone())
                    .then(colon.clone())
                    .or_not(),
            )
            .then(type_expression.clone())
            .then(optional_marker.clone())
            .ignored();

        let tuple = tuple_element
            .separated_by(comma.clone())
            .allow_trailing()
            .collect::<Vec<()>>()
            .delimited_by(bracket_square_open.clone(), bracket_square_close.clone())
            .ignored();

        let parenthesized = type_expression
            .clone()
            .delimited_by(bracket_round_open.clone(), bracket_round_close.clone());

        let type_query = keyword(Keyword::Typeof)
            .then(
                property_name
                    .clone()
                    .separated_by(dot.clone())
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .ignored();

        let type_operator = select! {
            Token::Identifier("keyof") => (),
            Token::Identifier("readonly") => (),
            Token::Identifier("unique") => (),
        }
        .then(type_expression.clone())
        .ignored();

        let primary = choice((
            function_type,
            parenthesized,
            object_type,
            tuple,
            type_query,
            type_operator,
            literal,
            negative_number,
            reference,
        ));

        // `T[]` and indexed access `T['key']`.
        let postfix = primary
            .then(
                type_expression
                    .clone()
                    .or_not()
                    .delimited_by(bracket_square_open.clone(), bracket_square_close.clone())
                    .repeated(),
            )
            .ignored();

        let combinator = just(Token::Pipe).or(just(Token::Ampersand));

        combinator
            .clone()
            .or_not()
            .ignore_then(
                postfix
                    .separated_by(combinator)
                    .at_least(1)
                    .collect::<Vec<()>>(),
            )
            // Type predicates: `value is string`.
            .then(
                select! { Token::Identifier("is") => () }
                    .then(type_expression.clone())
                    .or_not(),
            )
            .ignored()
            .boxed()
    });

    let return_type = colon
        .clone()
        .ignore_then(type_expression.clone())
        .map_with(|_, extra| TypeAnnotation { span: extra.span() })
        .boxed();

    // `?`, `!` and `: T` after a binding.
    let type_suffix = question
        .clone()
        .or(just(Token::Bang))
        .or_not()
        .then(colon.clone().then(type_expression.clone()).or_not())
        .map_with(|(marker, annotation), extra| {
            (marker.is_some() || annotation.is_some()).then(|| TypeAnnotation { span: extra.span() })
        })
        .boxed();

    let modifier = select! {
        Token::Identifier("public") => (),
        Token::Identifier("private") => (),
        Token::Identifier("protected") => (),
        Token::Identifier("readonly") => (),
        Token::Identifier("override") => (),
        Token::Identifier("declare") => (),
        Token::Identifier("abstract") => (),
    }
    // A member literally named `readonly` is not a modifier.
    .then_ignore(
        choice((
            bracket_round_open.clone(),
            colon.clone(),
            assign.clone(),
            semicolon.clone(),
            question.clone(),
            just(Token::Less),
            bracket_curly_close.clone(),
        ))
        .not(),
    )
    .map_with(|_, extra| TypeAnnotation { span: extra.span() })
    .boxed();

    pattern.define({
        let default_value = assign.clone().ignore_then(expression.clone()).or_not();

        let array_item = choice((
            ellipsis
                .clone()
                .ignore_then(pattern.clone())
                .map(ArrayPatternItem::Rest),
            pattern
                .clone()
                .then(default_value.clone())
                .map(|(pattern, default)| ArrayPatternItem::Element(PatternElement { pattern, default })),
        ));

        let array = array_item
            .or_not()
            .separated_by(comma.clone())
            .collect::<Vec<_>>()
            .delimited_by(bracket_square_open.clone(), bracket_square_close.clone())
            .try_map(|items, span| array_pattern(items).map_err(|message| ParseError::custom(span, message)));

        let object_item = choice((
            ellipsis
                .clone()
                .ignore_then(identifier.clone())
                .map(ObjectPatternItem::Rest),
            property_key
                .clone()
                .then_ignore(colon.clone())
                .then(pattern.clone())
                .then(default_value.clone())
                .map(|((key, value), default)| {
                    ObjectPatternItem::Property(ObjectPatternProperty { key, value, default })
                }),
            identifier
                .clone()
                .then(default_value)
                .map(|(name, default)| {
                    ObjectPatternItem::Property(ObjectPatternProperty {
                        key: PropertyKey::Named(name.clone()),
                        value: Pattern::Identifier(name),
                        default,
                    })
                }),
        ));

        let object = object_item
            .separated_by(comma.clone())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(bracket_curly_open.clone(), bracket_curly_close.clone())
            .try_map(|items, span| object_pattern(items).map_err(|message| ParseError::custom(span, message)));

        choice((identifier.clone().map(Pattern::Identifier), array, object)).boxed()
    });

    let parameter = group((
        modifier
            .clone()
            .repeated()
            .at_least(1)
            .collect::<Vec<_>>()
            .map_with(|_, extra| TypeAnnotation { span: extra.span() })
            .or_not(),
        ellipsis.clone().or_not(),
        pattern.clone(),
        type_suffix.clone(),
        assign.clone().ignore_then(expression.clone()).or_not(),
    ))
    .map(|(property, rest, pattern, annotation, default)| Parameter {
        pattern,
        annotation,
        default,
        rest: rest.is_some(),
        property,
    });

    let parameters = parameter
        .separated_by(comma.clone())
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(bracket_round_open.clone(), bracket_round_close.clone())
        .boxed();

    let block = statement
        .clone()
        .repeated()
        .collect::<Vec<_>>()
        .delimited_by(bracket_curly_open.clone(), bracket_curly_close.clone())
        .map(without_inserted_semicolons)
        .boxed();

    // Type parameters, parameters, return type and body of a non-arrow function.
    let function_tail = type_parameters
        .clone()
        .or_not()
        .then(parameters.clone())
        .then(return_type.clone().or_not())
        .then(block.clone())
        .boxed();

    // `get key`, `set key`, `async key` or a plain `key` in front of a method.
    let method_head = choice((
        select! {
            Token::Identifier("get") => MethodKind::Getter,
            Token::Identifier("set") => MethodKind::Setter,
        }
        .then(property_key.clone())
        .map(|(kind, key)| (key, kind, false)),
        async_keyword
            .clone()
            .ignore_then(property_key.clone())
            .map(|key| (key, MethodKind::Method, true)),
        property_key.clone().map(|key| (key, MethodKind::Method, false)),
    ))
    .boxed();

    // `a, b` where a single expression is allowed to be a sequence.
    let sequence = expression
        .clone()
        .separated_by(comma.clone())
        .at_least(1)
        .collect::<Vec<_>>()
        .map_with(|mut expressions: Vec<Spanned<Expression>>, extra| {
            if expressions.len() == 1
                && let Some(expression) = expressions.pop()
            {
                return expression;
            }
            Spanned {
                node: Expression::Sequence(expressions),
                span: extra.span(),
            }
        })
        .boxed();

    let arguments = choice((
        ellipsis
            .clone()
            .ignore_then(expression.clone())
            .map(Argument::Spread),
        expression.clone().map(Argument::Expression),
    ))
    .separated_by(comma.clone())
    .allow_trailing()
    .collect::<Vec<_>>()
    .delimited_by(bracket_round_open.clone(), bracket_round_close.clone())
    .boxed();

    expression.define({
        let literal = select! {
            Token::Number(number) => Expression::Number(number),
            Token::Text(raw) => Expression::String(unescape(raw)),
            Token::Keyword(Keyword::True) => Expression::Boolean(true),
            Token::Keyword(Keyword::False) => Expression::Boolean(false),
            Token::Keyword(Keyword::Null) => Expression::Null,
            Token::Keyword(Keyword::This) => Expression::This,
            Token::Identifier(name) => Expression::Identifier(name.to_string()),
            Token::Regex { pattern, flags } => Expression::Regex {
                pattern: pattern.to_string(),
                flags: flags.to_string(),
            },
        };

        let template_parts = select! { Token::Template(raw) => raw }.try_map(|raw, span| {
            parse_template(raw, span).map_err(|message| ParseError::custom(span, message))
        });

        let template = template_parts.clone().map(|parts| Expression::Template {
            quasis: parts.quasis,
            expressions: parts.expressions,
        });

        let array = choice((
            ellipsis
                .clone()
                .ignore_then(expression.clone())
                .map(Argument::Spread),
            expression.clone().map(Argument::Expression),
        ))
        .separated_by(comma.clone())
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(bracket_square_open.clone(), bracket_square_close.clone())
        .map(Expression::Array);

        let object_property = choice((
            ellipsis
                .clone()
                .ignore_then(expression.clone())
                .map(ObjectProperty::Spread),
            method_head.clone().then(function_tail.clone()).map_with(
                |((key, kind, is_async), (((type_parameters, parameters), return_type), body)), extra| {
                    let name = match &key {
                        PropertyKey::Named(name) => Some(name.clone()),
                        PropertyKey::Computed(_) => None,
                    };
                    ObjectProperty::Method {
                        key,
                        function: Rc::new(Function {
                            name,
                            type_parameters,
                            parameters,
                            return_type,
                            body: FunctionBody::Block(body),
                            is_arrow: false,
                            is_async,
                            span: extra.span(),
                        }),
                        kind,
                    }
                },
            ),
            property_key
                .clone()
                .then_ignore(colon.clone())
                .then(expression.clone())
                .map(|(key, value)| ObjectProperty::KeyValue { key, value }),
            identifier.clone().map(ObjectProperty::Shorthand),
        ));

        let object = object_property
            .separated_by(comma.clone())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(bracket_curly_open.clone(), bracket_curly_close.clone())
            .map(Expression::Object);

        let function = async_keyword
            .clone()
            .or_not()
            .then_ignore(keyword(Keyword::Function))
            .then(identifier.clone().or_not())
            .then(function_tail.clone())
            .map_with(|((is_async, name), (((type_parameters, parameters), return_type), body)), extra| {
                Expression::Function(Rc::new(Function {
                    name,
                    type_parameters,
                    parameters,
                    return_type,
                    body: FunctionBody::Block(body),
                    is_arrow: false,
                    is_async: is_async.is_some(),
                    span: extra.span(),
                }))
            });

        let arrow_head = choice((
            identifier
                .clone()
                .then_ignore(arrow.clone())
                .map(|name| (None, vec![Parameter::named(name)], None)),
            type_parameters
                .clone()
                .or_not()
                .then(parameters.clone())
                .then(return_type.clone().or_not())
                .then_ignore(arrow.clone())
                .map(|((type_parameters, parameters), return_type)| {
                    (type_parameters, parameters, return_type)
                }),
        ));

        let arrow_function = async_keyword
            .clone()
            .or_not()
            .then(arrow_head)
            .then(choice((
                block.clone().map(FunctionBody::Block),
                expression
                    .clone()
                    .map(|body| FunctionBody::Expression(Box::new(body))),
            )))
            .map_with(|((is_async, (type_parameters, parameters, return_type)), body), extra| {
                Expression::Function(Rc::new(Function {
                    name: None,
                    type_parameters,
                    parameters,
                    return_type,
                    body,
                    is_arrow: true,
                    is_async: is_async.is_some(),
                    span: extra.span(),
                }))
            });

        let new_callee = choice((
            identifier.clone().map(Expression::Identifier),
            keyword(Keyword::This).to(Expression::This),
        ))
        .map_with(|node, extra| Spanned {
            node,
            span: extra.span(),
        })
        .or(expression
            .clone()
            .delimited_by(bracket_round_open.clone(), bracket_round_close.clone())
            .map_with(|expression, extra| Spanned {
                node: expression.node,
                span: extra.span(),
            }))
        .then(
            dot.clone()
                .ignore_then(property_name.clone())
                .map_with(|name, extra| (name, extra.span()))
                .repeated()
                .collect::<Vec<_>>(),
        )
        .map(|(root, members)| {
            members.into_iter().fold(root, |object, (name, span)| Spanned {
                span: join(object.span, span),
                node: Expression::Member {
                    object: Box::new(object),
                    property: MemberProperty::Named(name),
                    optional: false,
                },
            })
        });

        let new = keyword(Keyword::New)
            .ignore_then(new_callee)
            .then(arguments.clone().or_not())
            .map(|(callee, arguments)| Expression::New {
                callee: Box::new(callee),
                arguments: arguments.unwrap_or_default(),
            });

        let super_expression = keyword(Keyword::Super).ignore_then(choice((
            arguments.clone().map(Expression::SuperCall),
            dot.clone()
                .ignore_then(property_name.clone())
                .map(Expression::SuperMember),
        )));

        let atom = choice((
            arrow_function,
            function,
            new,
            super_expression,
            template,
            literal,
            array,
            object,
        ))
        .map_with(|node, extra| Spanned {
            node,
            span: extra.span(),
        })
        .or(sequence
            .clone()
            .delimited_by(bracket_round_open.clone(), bracket_round_close.clone())
            .map_with(|expression, extra| Spanned {
                node: expression.node,
                span: extra.span(),
            }))
        .boxed();

        let assignment_operator = select! {
            Token::Assign => AssignOperator::Assign,
            Token::PlusAssign => AssignOperator::Arithmetic(BinaryOperator::Add),
            Token::MinusAssign => AssignOperator::Arithmetic(BinaryOperator::Subtract),
            Token::AsteriskAssign => AssignOperator::Arithmetic(BinaryOperator::Multiply),
            Token::AsteriskAsteriskAssign => AssignOperator::Arithmetic(BinaryOperator::Exponent),
            Token::SlashAssign => AssignOperator::Arithmetic(BinaryOperator::Divide),
            Token::PercentAssign => AssignOperator::Arithmetic(BinaryOperator::Remainder),
            Token::AndAssign => AssignOperator::Logical(LogicalOperator::And),
            Token::OrAssign => AssignOperator::Logical(LogicalOperator::Or),
            Token::NullishAssign => AssignOperator::Logical(LogicalOperator::Nullish),
        };

        let equality_operator = select! {
            Token::Equal => BinaryOperator::Equal,
            Token::NotEqual => BinaryOperator::NotEqual,
            Token::StrictEqual => BinaryOperator::StrictEqual,
            Token::StrictNotEqual => BinaryOperator::StrictNotEqual,
        };

        let relational_operator = select! {
            Token::Less => BinaryOperator::Less,
            Token::LessOrEqual => BinaryOperator::LessOrEqual,
            Token::Greater => BinaryOperator::Greater,
            Token::GreaterOrEqual => BinaryOperator::GreaterOrEqual,
            Token::Keyword(Keyword::In) => BinaryOperator::In,
            Token::Keyword(Keyword::Instanceof) => BinaryOperator::Instanceof,
        };

        let additive_operator = select! {
            Token::Plus => BinaryOperator::Add,
            Token::Minus => BinaryOperator::Subtract,
        };

        let multiplicative_operator = select! {
            Token::Asterisk => BinaryOperator::Multiply,
            Token::Slash => BinaryOperator::Divide,
            Token::Percent => BinaryOperator::Remainder,
        };

        let prefix_operator = select! {
            Token::Bang => Prefix::Unary(UnaryOperator::Not),
            Token::Minus => Prefix::Unary(UnaryOperator::Negate),
            Token::Plus => Prefix::Unary(UnaryOperator::Plus),
            Token::Tilde => Prefix::Unary(UnaryOperator::BitwiseNot),
            Token::Keyword(Keyword::Typeof) => Prefix::Unary(UnaryOperator::Typeof),
            Token::Keyword(Keyword::Void) => Prefix::Unary(UnaryOperator::Void),
            Token::Keyword(Keyword::Delete) => Prefix::Unary(UnaryOperator::Delete),
            Token::Increment => Prefix::Update(UpdateOperator::Increment),
            Token::Decrement => Prefix::Update(UpdateOperator::Decrement),
            Token::Identifier("await") => Prefix::Await,
        };

        let computed_member = sequence
            .clone()
            .delimited_by(bracket_square_open.clone(), bracket_square_close.clone());

        let postfix_operator = choice((
            arguments.clone().map(Postfix::Call),
            dot.clone()
                .ignore_then(property_name.clone())
                .map(Postfix::Member),
            just(Token::OptionalChain).ignore_then(choice((
                arguments.clone().map(Postfix::OptionalCall),
                computed_member.clone().map(Postfix::OptionalIndex),
                property_name.clone().map(Postfix::OptionalMember),
            ))),
            computed_member.map(Postfix::Index),
            just(Token::Bang).map_with(|_, extra| Postfix::NonNull(TypeAnnotation { span: extra.span() })),
            just(Token::Increment).to(Postfix::Update(UpdateOperator::Increment)),
            just(Token::Decrement).to(Postfix::Update(UpdateOperator::Decrement)),
            template_parts.map(|parts| Postfix::Template {
                quasis: parts.quasis,
                raw: parts.raw,
                expressions: parts.expressions,
            }),
        ));

        let type_assertion = select! {
            Token::Identifier("as") => (),
            Token::Identifier("satisfies") => (),
        }
        .then(keyword(Keyword::Const).ignored().or(type_expression.clone()))
        .map_with(|_, extra| TypeAnnotation { span: extra.span() });

        atom.pratt((
            infix(right(1), assignment_operator, |target: Spanned<Expression>, operator, value: Spanned<Expression>, _| Spanned {
                span: join(target.span, value.span),
                node: Expression::Assign {
                    operator,
                    target: Box::new(target),
                    value: Box::new(value),
                },
            }),
            infix(
                right(2),
                question
                    .clone()
                    .ignore_then(expression.clone())
                    .then_ignore(colon.clone()),
                |test: Spanned<Expression>, consequent, alternate: Spanned<Expression>, _| Spanned {
                    span: join(test.span, alternate.span),
                    node: Expression::Conditional {
                        test: Box::new(test),
                        consequent: Box::new(consequent),
                        alternate: Box::new(alternate),
                    },
                },
            ),
            infix(left(3), just(Token::Nullish), |left, _, right, _| {
                logical(LogicalOperator::Nullish, left, right)
            }),
            infix(left(4), just(Token::Or), |left, _, right, _| {
                logical(LogicalOperator::Or, left, right)
            }),
            infix(left(5), just(Token::And), |left, _, right, _| {
                logical(LogicalOperator::And, left, right)
            }),
            infix(left(6), just(Token::Pipe), |left, _, right, _| {
                binary(BinaryOperator::BitwiseOr, left, right)
            }),
            infix(left(7), just(Token::Caret), |left, _, right, _| {
                binary(BinaryOperator::BitwiseXor, left, right)
            }),
            infix(left(8), just(Token::Ampersand), |left, _, right, _| {
                binary(BinaryOperator::BitwiseAnd, left, right)
            }),
            infix(left(9), equality_operator, |left, operator, right, _| {
                binary(operator, left, right)
            }),
            infix(left(10), relational_operator, |left, operator, right, _| {
                binary(operator, left, right)
            }),
            postfix(10, type_assertion, |expression: Spanned<Expression>, annotation: TypeAnnotation, _| Spanned {
                span: join(expression.span, annotation.span),
                node: Expression::TypeAssertion {
                    expression: Box::new(expression),
                    annotation,
                },
            }),
            infix(left(11), additive_operator, |left, operator, right, _| {
                binary(operator, left, right)
            }),
            infix(left(12), multiplicative_operator, |left, operator, right, _| {
                binary(operator, left, right)
            }),
            infix(right(13), just(Token::AsteriskAsterisk), |left, _, right, _| {
                binary(BinaryOperator::Exponent, left, right)
            }),
            prefix(14, prefix_operator, |operator, operand: Spanned<Expression>, extra| Spanned {
                span: join(extra.span(), operand.span),
                node: match operator {
                    Prefix::Unary(operator) => Expression::Unary {
                        operator,
                        operand: Box::new(operand),
                    },
                    Prefix::Update(operator) => Expression::Update {
                        operator,
                        prefix: true,
                        target: Box::new(operand),
                    },
                    Prefix::Await => Expression::Await(Box::new(operand)),
                },
            }),
            postfix(15, postfix_operator, |expression: Spanned<Expression>, operator, extra| {
                let span = join(expression.span, extra.span());
                let expression = Box::new(expression);
                let node = match operator {
                    Postfix::Call(arguments) => Expression::Call {
                        callee: expression,
                        arguments,
                        optional: false,
                    },
                    Postfix::OptionalCall(arguments) => Expression::Call {
                        callee: expression,
                        arguments,
                        optional: true,
                    },
                    Postfix::Member(name) => Expression::Member {
                        object: expression,
                        property: MemberProperty::Named(name),
                        optional: false,
                    },
                    Postfix::OptionalMember(name) => Expression::Member {
                        object: expression,
                        property: MemberProperty::Named(name),
                        optional: true,
                    },
                    Postfix::Index(index) => Expression::Member {
                        object: expression,
                        property: MemberProperty::Computed(Box::new(index)),
                        optional: false,
                    },
                    Postfix::OptionalIndex(index) => Expression::Member {
                        object: expression,
                        property: MemberProperty::Computed(Box::new(index)),
                        optional: true,
                    },
                    Postfix::NonNull(annotation) => Expression::TypeAssertion {
                        expression,
                        annotation,
                    },
                    Postfix::Update(operator) => Expression::Update {
                        operator,
                        prefix: false,
                        target: expression,
                    },
                    Postfix::Template {
                        quasis,
                        raw,
                        expressions,
                    } => Expression::TaggedTemplate {
                        tag: expression,
                        quasis,
                        raw,
                        expressions,
                    },
                };
                Spanned { node, span }
            }),
        ))
        .boxed()
    });

    statement.define({
        let terminator = choice((
            semicolon.clone().ignored(),
            bracket_curly_close.clone().rewind().ignored(),
            keyword(Keyword::Else).rewind().ignored(),
            end(),
        ))
        .boxed();

        let declaration_kind = select! {
            Token::Keyword(Keyword::Const) => DeclarationKind::Const,
            Token::Keyword(Keyword::Let) => DeclarationKind::Let,
            Token::Keyword(Keyword::Var) => DeclarationKind::Var,
        };

        let declarator = group((
            pattern.clone(),
            type_suffix.clone(),
            assign.clone().ignore_then(expression.clone()).or_not(),
        ))
        .map(|(pattern, annotation, init)| Declarator {
            pattern,
            annotation,
            init,
        });

        let variable_declaration = declaration_kind
            .then(
                declarator
                    .separated_by(comma.clone())
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .map(|(kind, declarators)| VariableDeclaration { kind, declarators })
            .boxed();

        let function_signature = async_keyword
            .clone()
            .or_not()
            .map(|keyword| keyword.is_some())
            .then_ignore(keyword(Keyword::Function))
            .then(identifier.clone())
            .then(type_parameters.clone().or_not())
            .then(parameters.clone())
            .then(return_type.clone().or_not())
            .boxed();

        // Without a body it is an overload signature.
        let function_declaration = function_signature
            .clone()
            .then(block.clone().map(Some).or(terminator.clone().to(None)))
            .map_with(
                |(((((is_async, name), type_parameters), parameters), return_type), body), extra| match body {
                    Some(body) => Statement::Function(Rc::new(Function {
                        name: Some(name),
                        type_parameters,
                        parameters,
                        return_type,
                        body: FunctionBody::Block(body),
                        is_arrow: false,
                        is_async,
                        span: extra.span(),
                    })),
                    None => Statement::TypeOnly,
                },
            );

        let member_name_follows = choice((
            bracket_round_open.clone(),
            colon.clone(),
            assign.clone(),
            semicolon.clone(),
            question.clone(),
            just(Token::Less),
            bracket_curly_close.clone(),
        ));

        let static_keyword = select! { Token::Identifier("static") => () }
            .then_ignore(member_name_follows.not());

        let constructor = select! { Token::Identifier("constructor") => () }
            .ignore_then(parameters.clone())
            .then(block.clone())
            .map_with(|(parameters, body), extra| {
                ClassMemberKind::Constructor(Rc::new(Function {
                    name: Some("constructor".to_string()),
                    type_parameters: None,
                    parameters,
                    return_type: None,
                    body: FunctionBody::Block(body),
                    is_arrow: false,
                    is_async: false,
                    span: extra.span(),
                }))
            });

        let index_signature = identifier
            .clone()
            .then(colon.clone())
            .then(type_expression.clone())
            .delimited_by(bracket_square_open.clone(), bracket_square_close.clone())
            .then(colon.clone())
            .then(type_expression.clone())
            .then(terminator.clone())
            .map_with(|_, extra| ClassMemberKind::Signature(TypeAnnotation { span: extra.span() }));

        let method = method_head
            .clone()
            .then(type_parameters.clone().or_not())
            .then(parameters.clone())
            .then(return_type.clone().or_not())
            .then(block.clone().map(Some).or(terminator.clone().to(None)))
            .map_with(
                |(((((key, kind, is_async), type_parameters), parameters), return_type), body), extra| match body {
                    Some(body) => {
                        let name = match &key {
                            PropertyKey::Named(name) => Some(name.clone()),
                            PropertyKey::Computed(_) => None,
                        };
                        ClassMemberKind::Method {
                            key,
                            function: Rc::new(Function {
                                name,
                                type_parameters,
                                parameters,
                                return_type,
                                body: FunctionBody::Block(body),
                                is_arrow: false,
                                is_async,
                                span: extra.span(),
                            }),
                            kind,
                        }
                    }
                    None => ClassMemberKind::Signature(TypeAnnotation { span: extra.span() }),
                },
            );

        let field = property_key
            .clone()
            .then(type_suffix.clone())
            .then(assign.clone().ignore_then(expression.clone()).or_not())
            .then_ignore(terminator.clone())
            .map(|((key, annotation), value)| ClassMemberKind::Field {
                key,
                annotation,
                value,
            });

        let modifiers = modifier.clone().repeated().collect::<Vec<_>>();

        let class_member = group((
            modifiers.clone(),
            static_keyword.or_not().map(|keyword| keyword.is_some()),
            modifiers,
            choice((constructor, index_signature, method, field)),
        ))
        .map(|(mut modifiers, is_static, more_modifiers, kind)| {
            modifiers.extend(more_modifiers);
            ClassMember {
                modifiers,
                is_static,
                kind,
            }
        });

        let class_body = class_member
            .map(Some)
            .or(semicolon.clone().to(None))
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(bracket_curly_open.clone(), bracket_curly_close.clone())
            .map(|members| members.into_iter().flatten().collect::<Vec<_>>());

        let super_class = keyword(Keyword::Extends)
            .ignore_then(
                identifier
                    .clone()
                    .map_with(|name, extra| Spanned {
                        node: Expression::Identifier(name),
                        span: extra.span(),
                    })
                    .then(
                        dot.clone()
                            .ignore_then(property_name.clone())
                            .map_with(|name, extra| (name, extra.span()))
                            .repeated()
                            .collect::<Vec<_>>(),
                    )
                    .map(|(root, members)| {
                        members.into_iter().fold(root, |object, (name, span)| Spanned {
                            span: join(object.span, span),
                            node: Expression::Member {
                                object: Box::new(object),
                                property: MemberProperty::Named(name),
                                optional: false,
                            },
                        })
                    }),
            )
            .then(type_arguments.clone().or_not());

        let implements = select! { Token::Identifier("implements") => () }
            .then(
                type_expression
                    .clone()
                    .separated_by(comma.clone())
                    .at_least(1)
                    .collect::<Vec<()>>(),
            )
            .map_with(|_, extra| TypeAnnotation { span: extra.span() });

        let class_declaration = keyword(Keyword::Class)
            .ignore_then(identifier.clone())
            .then(type_parameters.clone().or_not())
            .then(super_class.or_not())
            .then(implements.or_not())
            .then(class_body)
            .map_with(|((((name, type_parameters), super_class), implements), members), extra| {
                let (super_class, super_type_arguments) = match super_class {
                    Some((super_class, type_arguments)) => (Some(super_class), type_arguments),
                    None => (None, None),
                };
                Rc::new(Class {
                    name: Some(name),
                    type_parameters,
                    super_class,
                    super_type_arguments,
                    implements,
                    members,
                    span: extra.span(),
                })
            })
            .boxed();

        let if_statement = keyword(Keyword::If)
            .ignore_then(
                sequence
                    .clone()
                    .delimited_by(bracket_round_open.clone(), bracket_round_close.clone()),
            )
            .then(statement.clone())
            .then(keyword(Keyword::Else).ignore_then(statement.clone()).or_not())
            .map(|((test, consequent), alternate)| Statement::If {
                test,
                consequent: Box::new(consequent),
                alternate: alternate.map(Box::new),
            });

        let for_binding = declaration_kind
            .or_not()
            .then(pattern.clone())
            .map(|(kind, pattern)| ForBinding { kind, pattern });

        let for_in_of = keyword(Keyword::For)
            .ignore_then(
                for_binding
                    .then(choice((
                        select! { Token::Identifier("of") => true },
                        keyword(Keyword::In).to(false),
                    )))
                    .then(sequence.clone())
                    .delimited_by(bracket_round_open.clone(), bracket_round_close.clone()),
            )
            .then(statement.clone())
            .map(|(((binding, is_of), source), body)| {
                let body = Box::new(body);
                if is_of {
                    Statement::ForOf {
                        binding,
                        iterable: source,
                        body,
                    }
                } else {
                    Statement::ForIn {
                        binding,
                        object: source,
                        body,
                    }
                }
            });

        let for_init = choice((
            variable_declaration.clone().map(ForInit::Variable),
            sequence.clone().map(ForInit::Expression),
        ));

        let for_statement = keyword(Keyword::For)
            .ignore_then(
                group((
                    for_init.or_not(),
                    semicolon.clone(),
                    sequence.clone().or_not(),
                    semicolon.clone(),
                    sequence.clone().or_not(),
                ))
                .delimited_by(bracket_round_open.clone(), bracket_round_close.clone()),
            )
            .then(statement.clone())
            .map(|((init, _, test, _, update), body)| Statement::For {
                init,
                test,
                update,
                body: Box::new(body),
            });

        let while_statement = keyword(Keyword::While)
            .ignore_then(
                sequence
                    .clone()
                    .delimited_by(bracket_round_open.clone(), bracket_round_close.clone()),
            )
            .then(statement.clone())
            .map(|(test, body)| Statement::While {
                test,
                body: Box::new(body),
            });

        // A block body followed by a newline gets a `;` before `while`.
        let do_while_statement = keyword(Keyword::Do)
            .ignore_then(statement.clone())
            .then_ignore(semicolon.clone().or_not())
            .then_ignore(keyword(Keyword::While))
            .then(
                sequence
                    .clone()
                    .delimited_by(bracket_round_open.clone(), bracket_round_close.clone()),
            )
            .then_ignore(semicolon.clone().or_not())
            .map(|(body, test)| Statement::DoWhile {
                body: Box::new(body),
                test,
            });

        let return_statement = keyword(Keyword::Return)
            .ignore_then(sequence.clone().or_not())
            .then_ignore(terminator.clone())
            .map(Statement::Return);

        let break_statement = keyword(Keyword::Break)
            .ignore_then(identifier.clone().or_not())
            .then_ignore(terminator.clone())
            .map(Statement::Break);

        let continue_statement = keyword(Keyword::Continue)
            .ignore_then(identifier.clone().or_not())
            .then_ignore(terminator.clone())
            .map(Statement::Continue);

        let throw_statement = keyword(Keyword::Throw)
            .ignore_then(sequence.clone())
            .then_ignore(terminator.clone())
            .map(Statement::Throw);

        let catch_clause = keyword(Keyword::Catch)
            .ignore_then(
                pattern
                    .clone()
                    .then(type_suffix.clone())
                    .delimited_by(bracket_round_open.clone(), bracket_round_close.clone())
                    .or_not(),
            )
            .then(block.clone())
            .map(|(parameter, body)| {
                let (parameter, annotation) = match parameter {
                    Some((parameter, annotation)) => (Some(parameter), annotation),
                    None => (None, None),
                };
                CatchClause {
                    parameter,
                    annotation,
                    body,
                }
            });

        let try_statement = keyword(Keyword::Try)
            .ignore_then(block.clone())
            .then(catch_clause.or_not())
            .then(keyword(Keyword::Finally).ignore_then(block.clone()).or_not())
            .try_map(|((block, handler), finalizer), span| {
                if handler.is_none() && finalizer.is_none() {
                    Err(ParseError::custom(span, "Missing catch or finally after try"))
                } else {
                    Ok(Statement::Try {
                        block,
                        handler,
                        finalizer,
                    })
                }
            });

        let switch_case = choice((
            keyword(Keyword::Case)
                .ignore_then(expression.clone())
                .map(Some),
            keyword(Keyword::Default).to(None),
        ))
        .then_ignore(colon.clone())
        .then(statement.clone().repeated().collect::<Vec<_>>())
        .map(|(test, body)| SwitchCase {
            test,
            body: without_inserted_semicolons(body),
        });

        let switch_statement = keyword(Keyword::Switch)
            .ignore_then(
                sequence
                    .clone()
                    .delimited_by(bracket_round_open.clone(), bracket_round_close.clone()),
            )
            .then(
                switch_case
                    .repeated()
                    .collect::<Vec<_>>()
                    .delimited_by(bracket_curly_open.clone(), bracket_curly_close.clone()),
            )
            .map(|(discriminant, cases)| Statement::Switch {
                discriminant,
                cases,
            });

        let type_alias = select! { Token::Identifier("type") => () }
            .then(identifier.clone())
            .then(type_parameters.clone().or_not())
            .then(assign.clone())
            .then(type_expression.clone())
            .then(terminator.clone())
            .to(Statement::TypeOnly);

        let interface = select! { Token::Identifier("interface") => () }
            .then(identifier.clone())
            .then(type_parameters.clone().or_not())
            .then(
                keyword(Keyword::Extends)
                    .then(
                        type_expression
                            .clone()
                            .separated_by(comma.clone())
                            .at_least(1)
                            .collect::<Vec<()>>(),
                    )
                    .or_not(),
            )
            .then(type_expression.clone())
            .to(Statement::TypeOnly);

        let enum_member = identifier
            .clone()
            .or(select! { Token::Text(raw) => unescape(raw) })
            .then(assign.clone().ignore_then(expression.clone()).or_not())
            .map(|(name, init)| EnumMember { name, init });

        let enum_declaration = keyword(Keyword::Const)
            .or_not()
            .ignore_then(select! { Token::Identifier("enum") => () })
            .ignore_then(identifier.clone())
            .then(
                enum_member
                    .separated_by(comma.clone())
                    .allow_trailing()
                    .collect::<Vec<_>>()
                    .delimited_by(bracket_curly_open.clone(), bracket_curly_close.clone()),
            )
            .map_with(|(name, members), extra| {
                Rc::new(Enum {
                    name,
                    members,
                    span: extra.span(),
                })
            })
            .boxed();

        let declare = select! { Token::Identifier("declare") => () }
            .then(choice((
                enum_declaration.clone().ignored(),
                variable_declaration.clone().ignored(),
                function_signature.ignored(),
                class_declaration.clone().ignored(),
            )))
            .then(terminator.clone().or_not())
            .to(Statement::TypeOnly);

        let declaration = choice((
            enum_declaration.map(Statement::Enum),
            variable_declaration
                .then_ignore(terminator.clone())
                .map(Statement::Variable),
            function_declaration,
            class_declaration.map(Statement::Class),
            type_alias,
            interface,
            declare,
        ));

        let control_flow = choice((
            if_statement,
            for_in_of,
            for_statement,
            while_statement,
            do_while_statement,
            return_statement,
            break_statement,
            continue_statement,
            throw_statement,
            try_statement,
            switch_statement,
        ));

        choice((
            block.clone().map(Statement::Block),
            declaration,
            control_flow,
            semicolon.clone().to(Statement::Empty),
            identifier
                .clone()
                .then_ignore(colon.clone())
                .then(statement.clone())
                .map(|(label, body)| Statement::Labeled {
                    label,
                    body: Box::new(body),
                }),
            sequence
                .clone()
                .then_ignore(terminator)
                .map(Statement::Expression),
        ))
        .map_with(|node, extra| Spanned {
            node,
            span: extra.span(),
        })
        .boxed()
    });

    statement
        .repeated()
        .collect()
        .then_ignore(end())
        .map(without_inserted_semicolons)
}

/// Drops the empty statements that semicolon insertion left behind a `}`.
fn without_inserted_semicolons(statements: Vec<Spanned<Statement>>) -> Vec<Spanned<Statement>> {
    statements
        .into_iter()
        .filter(|statement| !(matches!(statement.node, Statement::Empty) && statement.span.start == statement.span.end))
        .collect()
}

fn binary(
    operator: BinaryOperator,
    left: Spanned<Expression>,
    right: Spanned<Expression>,
) -> Spanned<Expression> {
    Spanned {
        span: join(left.span, right.span),
        node: Expression::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn logical(
    operator: LogicalOperator,
    left: Spanned<Expression>,
    right: Spanned<Expression>,
) -> Spanned<Expression> {
    Spanned {
        span: join(left.span, right.span),
        node: Expression::Logical {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! parse_and_test {
        ($code:expr, $test:expr) => {{
            let program = parse_program($code).unwrap();
            let statement = &program.into_iter().next().unwrap().node;
            $test(statement)
        }};
    }

    fn expression_of(statement: &Statement) -> &Expression {
        match statement {
            Statement::Expression(expression) => &expression.node,
            other => panic!("Expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_operator_precedence() {
        parse_and_test!("1 + 2 * 3", |statement: &Statement| {
            let Expression::Binary { operator, right, .. } = expression_of(statement) else {
                panic!("Expected binary expression");
            };
            assert_eq!(*operator, BinaryOperator::Add);
            assert!(matches!(
                right.node,
                Expression::Binary {
                    operator: BinaryOperator::Multiply,
                    ..
                }
            ));
        });
    }

    #[test]
    fn test_assignment_is_right_associative() {
        parse_and_test!("a = b = 1", |statement: &Statement| {
            let Expression::Assign { value, .. } = expression_of(statement) else {
                panic!("Expected assignment");
            };
            assert!(matches!(value.node, Expression::Assign { .. }));
        });
    }

    #[test]
    fn test_conditional_and_nullish() {
        parse_and_test!("a ?? b ? c : d", |statement: &Statement| {
            let Expression::Conditional { test, .. } = expression_of(statement) else {
                panic!("Expected conditional");
            };
            assert!(matches!(
                test.node,
                Expression::Logical {
                    operator: LogicalOperator::Nullish,
                    ..
                }
            ));
        });
    }

    #[test]
    fn test_member_call_chain() {
        parse_and_test!("numbers.map(n => n * 2).filter(Boolean)[0]?.value", |statement: &Statement| {
            let Expression::Member { optional, .. } = expression_of(statement) else {
                panic!("Expected member access");
            };
            assert!(optional);
        });
    }

    #[test]
    fn test_arrow_functions() {
        parse_and_test!("const add = (a: number, b = 1): number => a + b", |statement: &Statement| {
            let Statement::Variable(declaration) = statement else {
                panic!("Expected variable declaration");
            };
            let Some(Spanned {
                node: Expression::Function(function),
                ..
            }) = &declaration.declarators[0].init
            else {
                panic!("Expected arrow function");
            };
            assert!(function.is_arrow);
            assert_eq!(function.parameters.len(), 2);
            assert!(function.parameters[0].annotation.is_some());
            assert!(function.parameters[1].default.is_some());
            assert!(function.return_type.is_some());
        });
    }

    #[test]
    fn test_object_literal_statement_needs_parentheses() {
        parse_and_test!("({ a: 1, b, ...rest, m() { return 1 } })", |statement: &Statement| {
            let Expression::Object(properties) = expression_of(statement) else {
                panic!("Expected object literal");
            };
            assert_eq!(properties.len(), 4);
        });
    }

    #[test]
    fn test_destructuring_declaration() {
        parse_and_test!("const { a, b: [c, , ...d], e = 5, ...f } = value", |statement: &Statement| {
            let Statement::Variable(declaration) = statement else {
                panic!("Expected variable declaration");
            };
            let Pattern::Object { properties, rest } = &declaration.declarators[0].pattern else {
                panic!("Expected object pattern");
            };
            assert_eq!(properties.len(), 3);
            assert_eq!(rest.as_deref(), Some("f"));
            let Pattern::Array { elements, rest } = &properties[1].value else {
                panic!("Expected array pattern");
            };
            assert_eq!(elements.len(), 2);
            assert!(elements[1].is_none());
            assert!(rest.is_some());
        });
    }

    #[test]
    fn test_template_literal_spans_are_absolute() {
        parse_and_test!("`sum: ${a + b}`", |statement: &Statement| {
            let Expression::Template { quasis, expressions } = expression_of(statement) else {
                panic!("Expected template literal");
            };
            assert_eq!(quasis, &vec!["sum: ".to_string(), String::new()]);
            assert_eq!(expressions[0].span.into_range(), 8..13);
        });
    }

    #[test]
    fn test_class_declaration() {
        let code = "class Dog extends Animal implements Pet {\n  private name: string\n  static count = 0\n  constructor(name: string) { super(name) }\n  speak(): string { return super.speak() + '!' }\n}";
        parse_and_test!(code, |statement: &Statement| {
            let Statement::Class(class) = statement else {
                panic!("Expected class");
            };
            assert_eq!(class.name.as_deref(), Some("Dog"));
            assert!(class.super_class.is_some());
            assert!(class.implements.is_some());
            assert_eq!(class.members.len(), 4);
            assert_eq!(class.members[0].modifiers.len(), 1);
            assert!(class.members[1].is_static);
            assert!(class.constructor().is_some());
        });
    }

    #[test]
    fn test_type_only_statements() {
        let program = parse_program(
            "type Point = { x: number; y: number }\ninterface Named<T> extends Base {\n  name: T\n  greet(other?: Named<T>): void\n}\ndeclare const VERSION: string\nfunction id<T>(value: T): T\nfunction id(value) { return value }",
        )
        .unwrap();
        let kinds = program
            .iter()
            .map(|statement| matches!(statement.node, Statement::TypeOnly))
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec![true, true, true, true, false]);
    }

    #[test]
    fn test_control_flow() {
        let program = parse_program(
            "for (let i = 0; i < 3; i++) { if (i % 2) continue\n else total += i }\nfor (const [k, v] of entries) {}\nfor (const key in object) {}\nwhile (x) x--\ndo { y++ } while (y < 3)\ntry { risky() } catch { recover() } finally { done() }\nswitch (kind) {\n  case 'a':\n    break\n  default:\n    other()\n}",
        )
        .unwrap();
        assert_eq!(program.len(), 7);
        assert!(matches!(program[1].node, Statement::ForOf { .. }));
        assert!(matches!(program[2].node, Statement::ForIn { .. }));
        assert!(matches!(program[6].node, Statement::Switch { ref cases, .. } if cases.len() == 2));
    }

    #[test]
    fn test_type_assertions() {
        parse_and_test!("(value as unknown as string[])!.length", |statement: &Statement| {
            let Expression::Member { object, .. } = expression_of(statement) else {
                panic!("Expected member access");
            };
            assert!(matches!(object.node, Expression::TypeAssertion { .. }));
        });
    }

    #[test]
    fn test_block_followed_by_newline_adds_no_statement() {
        let program = parse_program("for (;;) {}\n1\nfunction f() {}\nf()\ndo {\n} \nwhile (false)").unwrap();
        assert_eq!(program.len(), 5);
        assert!(program.iter().all(|statement| !matches!(statement.node, Statement::Empty)));
        let program = parse_program(";\n1").unwrap();
        assert!(matches!(program[0].node, Statement::Empty));
    }

    #[test]
    fn test_as_const_on_its_own_line() {
        let program = parse_program("const x = [1, 2] as const\nx").unwrap();
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn test_regex_and_division() {
        parse_and_test!("a / 2 / b", |statement: &Statement| {
            assert!(matches!(
                expression_of(statement),
                Expression::Binary {
                    operator: BinaryOperator::Divide,
                    ..
                }
            ));
        });
        parse_and_test!("/[a-z]+/gi.test(s)", |statement: &Statement| {
            let Expression::Call { callee, .. } = expression_of(statement) else {
                panic!("Expected call");
            };
            let Expression::Member { object, .. } = &callee.node else {
                panic!("Expected member access");
            };
            assert!(matches!(&object.node, Expression::Regex { pattern, flags } if pattern == "[a-z]+" && flags == "gi"));
        });
    }

    #[test]
    fn test_comma_sequences() {
        parse_and_test!("for (let i = 0, j = 2; i < j; i++, j--) {}", |statement: &Statement| {
            let Statement::For { init, update, .. } = statement else {
                panic!("Expected for loop");
            };
            assert!(matches!(init, Some(ForInit::Variable(declaration)) if declaration.declarators.len() == 2));
            assert!(matches!(update, Some(Spanned { node: Expression::Sequence(items), .. }) if items.len() == 2));
        });
        parse_and_test!("f(a, b)", |statement: &Statement| {
            assert!(matches!(expression_of(statement), Expression::Call { arguments, .. } if arguments.len() == 2));
        });
        parse_and_test!("(1, 2, 3)", |statement: &Statement| {
            assert!(matches!(expression_of(statement), Expression::Sequence(items) if items.len() == 3));
        });
    }

    #[test]
    fn test_accessors() {
        parse_and_test!("({ get size() { return 1 }, set size(v) {}, get: 2 })", |statement: &Statement| {
            let Expression::Object(properties) = expression_of(statement) else {
                panic!("Expected object literal");
            };
            let kinds = properties
                .iter()
                .map(|property| match property {
                    ObjectProperty::Method { kind, .. } => Some(*kind),
                    _ => None,
                })
                .collect::<Vec<_>>();
            assert_eq!(kinds, vec![Some(MethodKind::Getter), Some(MethodKind::Setter), None]);
        });
        parse_and_test!("class A { static get count() { return 0 }\n get() {} }", |statement: &Statement| {
            let Statement::Class(class) = statement else {
                panic!("Expected class");
            };
            assert!(class.members[0].is_static);
            assert!(matches!(class.members[0].kind, ClassMemberKind::Method { kind: MethodKind::Getter, .. }));
            assert!(matches!(class.members[1].kind, ClassMemberKind::Method { kind: MethodKind::Method, .. }));
        });
    }

    #[test]
    fn test_async_functions() {
        let program =
            parse_program("async function load() { return await get() }\nconst f = async (x) => await x\nconst g = async x => x")
                .unwrap();
        let Statement::Function(function) = &program[0].node else {
            panic!("Expected function declaration");
        };
        assert!(function.is_async);
        let FunctionBody::Block(body) = &function.body else {
            panic!("Expected block body");
        };
        assert!(matches!(&body[0].node, Statement::Return(Some(Spanned { node: Expression::Await(_), .. }))));
        assert_eq!(program.len(), 3);
        // Plain identifiers named `async` and `await` still work.
        assert_eq!(parse_program("const async = 1\nasync + 1").unwrap().len(), 2);
    }

    #[test]
    fn test_await_outside_async_function() {
        let errors = parse_program("await load()").unwrap_err();
        assert!(errors[0].message.starts_with("await is only valid"));
        let errors = parse_program("async function f() {\n  [1].map((x) => await x)\n}").unwrap_err();
        assert_eq!(errors[0].line, 2);
    }

    #[test]
    fn test_enum_declarations() {
        let program = parse_program("enum Color { Red, Green = 'g', }\nconst enum Flag { A = 2 * 2 }\ndeclare enum Ambient { X }").unwrap();
        let Statement::Enum(color) = &program[0].node else {
            panic!("Expected enum");
        };
        assert_eq!(color.name, "Color");
        assert_eq!(color.members.len(), 2);
        assert!(color.members[1].init.is_some());
        assert!(matches!(program[1].node, Statement::Enum(_)));
        assert!(matches!(program[2].node, Statement::TypeOnly));
    }

    #[test]
    fn test_labels() {
        parse_and_test!("outer: for (const a of xs) { for (const b of ys) { continue outer } break outer }", |statement: &Statement| {
            let Statement::Labeled { label, body } = statement else {
                panic!("Expected labeled statement");
            };
            assert_eq!(label, "outer");
            assert!(matches!(body.node, Statement::ForOf { .. }));
        });
    }

    #[test]
    fn test_tagged_templates() {
        parse_and_test!(r"String.raw`a\n${b}c`", |statement: &Statement| {
            let Expression::TaggedTemplate { tag, quasis, raw, expressions } = expression_of(statement) else {
                panic!("Expected tagged template");
            };
            assert!(matches!(tag.node, Expression::Member { .. }));
            assert_eq!(quasis, &vec!["a\n".to_string(), "c".to_string()]);
            assert_eq!(raw, &vec![r"a\n".to_string(), "c".to_string()]);
            assert_eq!(expressions.len(), 1);
        });
    }

    #[test]
    fn test_syntax_error() {
        let errors = parse_program("1 +").unwrap_err();
        assert!(!errors.is_empty());
        assert_eq!(errors[0].line, 1);
        let errors = parse_program("const = 5").unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_statement_spans_cover_lines() {
        let program = parse_program("const a = 1\n\na + 1").unwrap();
        assert_eq!(program.len(), 2);
        let Statement::Expression(expression) = &program[1].node else {
            panic!("Expected expression statement");
        };
        assert_eq!(expression.span.into_range(), 13..18);
    }
}
