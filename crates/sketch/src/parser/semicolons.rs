//! Automatic semicolon insertion.
//!
//! The grammar never sees newlines or comments. Before parsing, a newline that
//! separates a token able to end a statement from a token unable to continue
//! one is replaced by a `;`, then trivia is dropped.

use super::lexer::{Keyword, Token};
use super::{Span, Spanned};

#[derive(Clone, Copy)]
enum Bracket {
    // True when the bracket opens an `if`/`for`/`while` header.
    Round { header: bool },
    Curly,
    Square,
}

pub fn insert_semicolons<'code>(tokens: Vec<Spanned<Token<'code>>>) -> Vec<Spanned<Token<'code>>> {
    let mut output: Vec<Spanned<Token<'code>>> = Vec::with_capacity(tokens.len());
    let mut brackets: Vec<Bracket> = Vec::new();
    let mut previous_ends_statement = false;
    let mut pending_newline: Option<Span> = None;

    for token in tokens {
        match token.node {
            Token::Newline => {
                pending_newline.get_or_insert(token.span);
                continue;
            }
            Token::Comment(comment) => {
                if comment.starts_with("/*") && comment.contains('\n') {
                    pending_newline.get_or_insert(token.span);
                }
                continue;
            }
            _ => {}
        }

        let statement_context = matches!(brackets.last(), None | Some(Bracket::Curly));
        if let Some(newline) = pending_newline.take()
            && statement_context
            && previous_ends_statement
            && !continues_statement(&token.node)
        {
            let offset = newline.into_range().start;
            output.push(Spanned {
                node: Token::Semicolon,
                span: Span::from(offset..offset),
            });
        }

        previous_ends_statement = match token.node {
            Token::BracketRoundOpen => {
                let header = matches!(
                    output.last().map(|previous| previous.node),
                    Some(Token::Keyword(Keyword::If | Keyword::For | Keyword::While))
                );
                brackets.push(Bracket::Round { header });
                false
            }
            Token::BracketCurlyOpen => {
                brackets.push(Bracket::Curly);
                false
            }
            Token::BracketSquareOpen => {
                brackets.push(Bracket::Square);
                false
            }
            Token::BracketRoundClose => match brackets.pop() {
                Some(Bracket::Round { header }) => !header,
                _ => true,
            },
            Token::BracketCurlyClose | Token::BracketSquareClose => {
                brackets.pop();
                true
            }
            // `value as const`
            Token::Keyword(Keyword::Const) => matches!(
                output.last().map(|previous| previous.node),
                Some(Token::Identifier("as" | "satisfies"))
            ),
            _ => ends_statement(&token.node),
        };
        output.push(token);
    }
    output
}

fn ends_statement(token: &Token) -> bool {
    matches!(
        token,
        Token::Identifier(_)
            | Token::Number(_)
            | Token::Text(_)
            | Token::Template(_)
            | Token::Regex { .. }
            | Token::Increment
            | Token::Decrement
            | Token::Bang
            | Token::Keyword(
                Keyword::True
                    | Keyword::False
                    | Keyword::Null
                    | Keyword::This
                    | Keyword::Super
                    | Keyword::Return
                    | Keyword::Break
                    | Keyword::Continue
            )
    )
}

fn continues_statement(token: &Token) -> bool {
    match token {
        Token::Identifier(word) => matches!(*word, "as" | "satisfies"),
        Token::Keyword(keyword) => matches!(
            keyword,
            Keyword::Else | Keyword::Catch | Keyword::Finally | Keyword::Instanceof | Keyword::In
        ),
        Token::Increment | Token::Decrement | Token::Bang | Token::Tilde => false,
        Token::Text(_) | Token::Template(_) | Token::Regex { .. } | Token::Number(_) => false,
        Token::Comment(_) | Token::Newline => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer;
    use chumsky::prelude::Parser;

    fn render(code: &str) -> String {
        let tokens = lexer().parse(code).into_result().unwrap();
        insert_semicolons(tokens)
            .into_iter()
            .map(|token| token.node.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn newline_after_expression_ends_statement() {
        assert_eq!(render("const a = 1\nconst b = a"), "const a = 1 ; const b = a");
    }

    #[test]
    fn operator_on_next_line_continues_statement() {
        assert_eq!(render("const a = 1\n  + 2\n  .toFixed()"), "const a = 1 + 2 . toFixed ( )");
    }

    #[test]
    fn control_header_does_not_end_statement() {
        assert_eq!(render("if (a)\n  b()\nc"), "if ( a ) b ( ) ; c");
    }

    #[test]
    fn return_on_its_own_line() {
        assert_eq!(render("return\nvalue"), "return ; value");
    }

    #[test]
    fn update_operator_starts_new_statement() {
        assert_eq!(render("a\n++b"), "a ; ++ b");
    }

    #[test]
    fn no_insertion_inside_round_brackets() {
        assert_eq!(render("for (const x of\n  xs) {}"), "for ( const x of xs ) { }");
        assert_eq!(
            render("xs.map(x => {\n  const y = x\n  return y\n})"),
            "xs . map ( x => { const y = x ; return y } )"
        );
    }

    #[test]
    fn const_assertion_ends_statement() {
        assert_eq!(render("const x = [1] as const\nx"), "const x = [ 1 ] as const ; x");
        assert_eq!(render("const\nx = 1"), "const x = 1");
    }

    #[test]
    fn regex_ends_statement() {
        assert_eq!(render("const re = /a+/g\nre"), "const re = /a+/g ; re");
    }

    #[test]
    fn multiline_block_comment_counts_as_newline() {
        assert_eq!(render("a /*\n*/ b"), "a ; b");
        assert_eq!(render("a /* x */ + b"), "a + b");
    }
}
