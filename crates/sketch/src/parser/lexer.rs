use super::{ParseError, Spanned};
use chumsky::inspector::RollbackState;
use chumsky::prelude::*;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'code> {
    BracketRoundOpen,
    BracketRoundClose,
    BracketCurlyOpen,
    BracketCurlyClose,
    BracketSquareOpen,
    BracketSquareClose,
    Comment(&'code str),
    Newline,
    Number(f64),
    // Raw contents between the quotes, escapes unprocessed.
    Text(&'code str),
    // Raw contents between the backticks, interpolations unparsed.
    Template(&'code str),
    Regex {
        pattern: &'code str,
        flags: &'code str,
    },
    Identifier(&'code str),
    Keyword(Keyword),
    Semicolon,
    Comma,
    Dot,
    Ellipsis,
    OptionalChain,
    Question,
    Colon,
    Arrow,
    Assign,
    Equal,
    StrictEqual,
    NotEqual,
    StrictNotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Plus,
    Minus,
    Asterisk,
    AsteriskAsterisk,
    Slash,
    Percent,
    Increment,
    Decrement,
    Bang,
    Tilde,
    Ampersand,
    Pipe,
    Caret,
    And,
    Or,
    Nullish,
    PlusAssign,
    MinusAssign,
    AsteriskAssign,
    AsteriskAsteriskAssign,
    SlashAssign,
    PercentAssign,
    AndAssign,
    OrAssign,
    NullishAssign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Break,
    Case,
    Catch,
    Class,
    Const,
    Continue,
    Default,
    Delete,
    Do,
    Else,
    Extends,
    False,
    Finally,
    For,
    Function,
    If,
    In,
    Instanceof,
    Let,
    New,
    Null,
    Return,
    Super,
    Switch,
    This,
    Throw,
    True,
    Try,
    Typeof,
    Var,
    Void,
    While,
}

impl Keyword {
    pub fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "break" => Self::Break,
            "case" => Self::Case,
            "catch" => Self::Catch,
            "class" => Self::Class,
            "const" => Self::Const,
            "continue" => Self::Continue,
            "default" => Self::Default,
            "delete" => Self::Delete,
            "do" => Self::Do,
            "else" => Self::Else,
            "extends" => Self::Extends,
            "false" => Self::False,
            "finally" => Self::Finally,
            "for" => Self::For,
            "function" => Self::Function,
            "if" => Self::If,
            "in" => Self::In,
            "instanceof" => Self::Instanceof,
            "let" => Self::Let,
            "new" => Self::New,
            "null" => Self::Null,
            "return" => Self::Return,
            "super" => Self::Super,
            "switch" => Self::Switch,
            "this" => Self::This,
            "throw" => Self::Throw,
            "true" => Self::True,
            "try" => Self::Try,
            "typeof" => Self::Typeof,
            "var" => Self::Var,
            "void" => Self::Void,
            "while" => Self::While,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Break => "break",
            Self::Case => "case",
            Self::Catch => "catch",
            Self::Class => "class",
            Self::Const => "const",
            Self::Continue => "continue",
            Self::Default => "default",
            Self::Delete => "delete",
            Self::Do => "do",
            Self::Else => "else",
            Self::Extends => "extends",
            Self::False => "false",
            Self::Finally => "finally",
            Self::For => "for",
            Self::Function => "function",
            Self::If => "if",
            Self::In => "in",
            Self::Instanceof => "instanceof",
            Self::Let => "let",
            Self::New => "new",
            Self::Null => "null",
            Self::Return => "return",
            Self::Super => "super",
            Self::Switch => "switch",
            Self::This => "this",
            Self::Throw => "throw",
            Self::True => "true",
            Self::Try => "try",
            Self::Typeof => "typeof",
            Self::Var => "var",
            Self::Void => "void",
            Self::While => "while",
        }
    }
}

impl<'code> Token<'code> {
    pub fn into_cow_str(self) -> Cow<'code, str> {
        match self {
            Self::BracketRoundOpen => "(".into(),
            Self::BracketRoundClose => ")".into(),
            Self::BracketCurlyOpen => "{".into(),
            Self::BracketCurlyClose => "}".into(),
            Self::BracketSquareOpen => "[".into(),
            Self::BracketSquareClose => "]".into(),
            Self::Comment(comment) => comment.into(),
            Self::Newline => "\n".into(),
            Self::Number(number) => number.to_string().into(),
            Self::Text(text) => format!("\"{text}\"").into(),
            Self::Template(template) => format!("`{template}`").into(),
            Self::Regex { pattern, flags } => format!("/{pattern}/{flags}").into(),
            Self::Identifier(identifier) => identifier.into(),
            Self::Keyword(keyword) => keyword.as_str().into(),
            Self::Semicolon => ";".into(),
            Self::Comma => ",".into(),
            Self::Dot => ".".into(),
            Self::Ellipsis => "...".into(),
            Self::OptionalChain => "?.".into(),
            Self::Question => "?".into(),
            Self::Colon => ":".into(),
            Self::Arrow => "=>".into(),
            Self::Assign => "=".into(),
            Self::Equal => "==".into(),
            Self::StrictEqual => "===".into(),
            Self::NotEqual => "!=".into(),
            Self::StrictNotEqual => "!==".into(),
            Self::Less => "<".into(),
            Self::LessOrEqual => "<=".into(),
            Self::Greater => ">".into(),
            Self::GreaterOrEqual => ">=".into(),
            Self::Plus => "+".into(),
            Self::Minus => "-".into(),
            Self::Asterisk => "*".into(),
            Self::AsteriskAsterisk => "**".into(),
            Self::Slash => "/".into(),
            Self::Percent => "%".into(),
            Self::Increment => "++".into(),
            Self::Decrement => "--".into(),
            Self::Bang => "!".into(),
            Self::Tilde => "~".into(),
            Self::Ampersand => "&".into(),
            Self::Pipe => "|".into(),
            Self::Caret => "^".into(),
            Self::And => "&&".into(),
            Self::Or => "||".into(),
            Self::Nullish => "??".into(),
            Self::PlusAssign => "+=".into(),
            Self::MinusAssign => "-=".into(),
            Self::AsteriskAssign => "*=".into(),
            Self::AsteriskAsteriskAssign => "**=".into(),
            Self::SlashAssign => "/=".into(),
            Self::PercentAssign => "%=".into(),
            Self::AndAssign => "&&=".into(),
            Self::OrAssign => "||=".into(),
            Self::NullishAssign => "??=".into(),
        }
    }
}

impl Token<'_> {
    /// Whether a `/` right after this token divides instead of starting a
    /// regular expression.
    fn ends_operand(self) -> bool {
        matches!(
            self,
            Self::Identifier(_)
                | Self::Number(_)
                | Self::Text(_)
                | Self::Template(_)
                | Self::Regex { .. }
                | Self::BracketRoundClose
                | Self::BracketSquareClose
                | Self::BracketCurlyClose
                | Self::Increment
                | Self::Decrement
                | Self::Keyword(Keyword::This | Keyword::Super | Keyword::True | Keyword::False | Keyword::Null)
        )
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.into_cow_str())
    }
}

/// What the lexer remembers between tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexerState {
    after_operand: bool,
}

type LexerExtra<'code> = extra::Full<ParseError<'code, char>, RollbackState<LexerState>, ()>;

pub fn lexer<'code>() -> impl Parser<'code, &'code str, Vec<Spanned<Token<'code>>>, LexerExtra<'code>> {
    let bracket = choice((
        just('(').to(Token::BracketRoundOpen),
        just(')').to(Token::BracketRoundClose),
        just('{').to(Token::BracketCurlyOpen),
        just('}').to(Token::BracketCurlyClose),
        just('[').to(Token::BracketSquareOpen),
        just(']').to(Token::BracketSquareClose),
    ));

    let line_comment = just("//")
        .then(any().and_is(text::newline().not()).repeated())
        .to_slice()
        .map(Token::Comment);

    let block_comment = just("/*")
        .then(any().and_is(just("*/").not()).repeated())
        .then(just("*/"))
        .to_slice()
        .map(Token::Comment);

    // Longest operators first, `?.` must not swallow the dot of `a?.5:b`.
    let long_operator = choice((
        just("...").to(Token::Ellipsis),
        just("===").to(Token::StrictEqual),
        just("!==").to(Token::StrictNotEqual),
        just("**=").to(Token::AsteriskAsteriskAssign),
        just("&&=").to(Token::AndAssign),
        just("||=").to(Token::OrAssign),
        just("??=").to(Token::NullishAssign),
        just("=>").to(Token::Arrow),
        just("==").to(Token::Equal),
        just("!=").to(Token::NotEqual),
        just("<=").to(Token::LessOrEqual),
        just(">=").to(Token::GreaterOrEqual),
        just("&&").to(Token::And),
        just("||").to(Token::Or),
        just("??").to(Token::Nullish),
        just("?.")
            .then_ignore(any().filter(char::is_ascii_digit).not())
            .to(Token::OptionalChain),
    ));

    let compound_operator = choice((
        just("**").to(Token::AsteriskAsterisk),
        just("++").to(Token::Increment),
        just("--").to(Token::Decrement),
        just("+=").to(Token::PlusAssign),
        just("-=").to(Token::MinusAssign),
        just("*=").to(Token::AsteriskAssign),
        just("/=").to(Token::SlashAssign),
        just("%=").to(Token::PercentAssign),
    ));

    let single_operator = choice((
        just(';').to(Token::Semicolon),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
        just('?').to(Token::Question),
        just(':').to(Token::Colon),
        just('=').to(Token::Assign),
        just('<').to(Token::Less),
        just('>').to(Token::Greater),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Asterisk),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
        just('!').to(Token::Bang),
        just('~').to(Token::Tilde),
        just('&').to(Token::Ampersand),
        just('|').to(Token::Pipe),
        just('^').to(Token::Caret),
    ));

    let digits = any()
        .filter(char::is_ascii_digit)
        .then(
            any()
                .filter(|character: &char| character.is_ascii_digit() || *character == '_')
                .repeated(),
        )
        .ignored();

    let exponent = one_of("eE")
        .then(one_of("+-").or_not())
        .then(digits.clone())
        .ignored();

    let decimal = choice((
        digits
            .clone()
            .then(just('.').then(any().filter(char::is_ascii_digit).repeated()).or_not())
            .ignored(),
        just('.').then(digits).ignored(),
    ))
    .then(exponent.or_not())
    .to_slice()
    .try_map(|literal: &str, span| {
        literal
            .replace('_', "")
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ParseError::custom(span, format!("Invalid number '{literal}'")))
    });

    let radix = just('0')
        .ignore_then(one_of("xXoObB"))
        .then(
            any()
                .filter(|character: &char| character.is_ascii_alphanumeric() || *character == '_')
                .repeated()
                .at_least(1)
                .to_slice(),
        )
        .try_map(|(prefix, digits): (char, &str), span| {
            let radix = match prefix.to_ascii_lowercase() {
                'x' => 16,
                'o' => 8,
                _ => 2,
            };
            u64::from_str_radix(&digits.replace('_', ""), radix)
                .map(|number| Token::Number(number as f64))
                .map_err(|_| ParseError::custom(span, format!("Invalid number '0{prefix}{digits}'")))
        });

    let number = radix.or(decimal);

    let escape = just('\\').then(any()).ignored();

    let double_quoted = just('"')
        .ignore_then(
            escape
                .clone()
                .or(none_of("\\\"\n").ignored())
                .repeated()
                .to_slice(),
        )
        .then_ignore(just('"'));

    let single_quoted = just('\'')
        .ignore_then(
            escape
                .clone()
                .or(none_of("\\'\n").ignored())
                .repeated()
                .to_slice(),
        )
        .then_ignore(just('\''));

    let text = double_quoted.or(single_quoted).map(Token::Text);

    let regex_class = just('[')
        .then(escape.clone().or(none_of("\\]\n").ignored()).repeated())
        .then(just(']'))
        .ignored();

    let regex = just('/')
        .ignore_then(
            choice((escape.clone(), regex_class, none_of("\\/[\n").ignored()))
                .repeated()
                .at_least(1)
                .to_slice(),
        )
        .then_ignore(just('/'))
        .then(any().filter(char::is_ascii_alphabetic).repeated().to_slice())
        .try_map_with(|(pattern, flags), extra: &mut chumsky::input::MapExtra<'code, '_, &'code str, LexerExtra<'code>>| {
            if extra.state().after_operand {
                Err(ParseError::custom(extra.span(), "Division, not a regular expression"))
            } else {
                Ok(Token::Regex { pattern, flags })
            }
        });

    let template = just('`')
        .ignore_then(escape.or(none_of("\\`").ignored()).repeated().to_slice())
        .then_ignore(just('`'))
        .map(Token::Template);

    let word = any()
        .filter(|character: &char| character.is_alphabetic() || *character == '_' || *character == '$')
        .then(
            any()
                .filter(|character: &char| {
                    character.is_alphanumeric() || *character == '_' || *character == '$'
                })
                .repeated(),
        )
        .to_slice()
        .map(|word: &str| match Keyword::from_word(word) {
            Some(keyword) => Token::Keyword(keyword),
            None => Token::Identifier(word),
        });

    let token = choice((
        line_comment,
        block_comment,
        number,
        text,
        template,
        regex,
        long_operator,
        compound_operator,
        bracket,
        single_operator,
        text::newline().to(Token::Newline),
        word,
    ));

    text::inline_whitespace().ignore_then(
        token
            .map_with(|token, extra| {
                if !matches!(token, Token::Comment(_) | Token::Newline) {
                    extra.state().after_operand = token.ends_operand();
                }
                Spanned {
                    node: token,
                    span: extra.span(),
                }
            })
            .then_ignore(text::inline_whitespace())
            .repeated()
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chumsky::prelude::Parser;

    fn tokens(code: &str) -> Vec<Token<'_>> {
        lexer()
            .parse(code)
            .into_result()
            .unwrap()
            .into_iter()
            .map(|token| token.node)
            .collect()
    }

    #[test]
    fn test_operators_prefer_longest_match() {
        assert_eq!(
            tokens("a !== b ?? c ?.d"),
            vec![
                Token::Identifier("a"),
                Token::StrictNotEqual,
                Token::Identifier("b"),
                Token::Nullish,
                Token::Identifier("c"),
                Token::OptionalChain,
                Token::Identifier("d"),
            ]
        );
    }

    #[test]
    fn test_optional_chain_is_not_conditional_with_fraction() {
        assert_eq!(
            tokens("a?.5:1"),
            vec![
                Token::Identifier("a"),
                Token::Question,
                Token::Number(0.5),
                Token::Colon,
                Token::Number(1.0),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("1_000 0xff .5 2e3 0b101"),
            vec![
                Token::Number(1000.0),
                Token::Number(255.0),
                Token::Number(0.5),
                Token::Number(2000.0),
                Token::Number(5.0),
            ]
        );
    }

    #[test]
    fn test_strings_keep_raw_escapes() {
        assert_eq!(
            tokens(r#"'it\'s' "a\"b" `x ${y}`"#),
            vec![
                Token::Text(r"it\'s"),
                Token::Text(r#"a\"b"#),
                Token::Template("x ${y}"),
            ]
        );
    }

    #[test]
    fn test_keywords_and_comments() {
        assert_eq!(
            tokens("const x = 1 // one\n/* two */"),
            vec![
                Token::Keyword(Keyword::Const),
                Token::Identifier("x"),
                Token::Assign,
                Token::Number(1.0),
                Token::Comment("// one"),
                Token::Newline,
                Token::Comment("/* two */"),
            ]
        );
    }

    #[test]
    fn test_slash_after_operand_divides() {
        assert_eq!(
            tokens("a / b / 2"),
            vec![
                Token::Identifier("a"),
                Token::Slash,
                Token::Identifier("b"),
                Token::Slash,
                Token::Number(2.0),
            ]
        );
        assert_eq!(
            tokens("(x) / 2"),
            vec![
                Token::BracketRoundOpen,
                Token::Identifier("x"),
                Token::BracketRoundClose,
                Token::Slash,
                Token::Number(2.0),
            ]
        );
    }

    #[test]
    fn test_regex_literals() {
        assert_eq!(
            tokens(r"const re = /a[/\]]+\/b/gi"),
            vec![
                Token::Keyword(Keyword::Const),
                Token::Identifier("re"),
                Token::Assign,
                Token::Regex {
                    pattern: r"a[/\]]+\/b",
                    flags: "gi",
                },
            ]
        );
        assert_eq!(
            tokens(r"s.split(/,\s*/)"),
            vec![
                Token::Identifier("s"),
                Token::Dot,
                Token::Identifier("split"),
                Token::BracketRoundOpen,
                Token::Regex {
                    pattern: r",\s*",
                    flags: "",
                },
                Token::BracketRoundClose,
            ]
        );
    }

    #[test]
    fn test_whitespace_only_source() {
        assert!(tokens("   \t ").is_empty());
    }
}
