//! Literal text handling shared by the parser and the interpreter.

/// Decodes the escape sequences of a string or template literal body.
pub fn unescape(raw: &str) -> String {
    let mut output = String::with_capacity(raw.len());
    let mut characters = raw.chars().peekable();
    while let Some(character) = characters.next() {
        if character != '\\' {
            output.push(character);
            continue;
        }
        let Some(escaped) = characters.next() else {
            output.push('\\');
            break;
        };
        match escaped {
            'n' => output.push('\n'),
            't' => output.push('\t'),
            'r' => output.push('\r'),
            'b' => output.push('\u{8}'),
            'f' => output.push('\u{c}'),
            'v' => output.push('\u{b}'),
            '0' => output.push('\0'),
            // Line continuation.
            '\n' => {}
            '\r' => {
                if characters.peek() == Some(&'\n') {
                    characters.next();
                }
            }
            'x' => {
                let hex: String = characters.by_ref().take(2).collect();
                push_code_point(&mut output, &hex);
            }
            'u' => {
                let hex: String = if characters.peek() == Some(&'{') {
                    characters.next();
                    characters.by_ref().take_while(|character| *character != '}').collect()
                } else {
                    characters.by_ref().take(4).collect()
                };
                push_code_point(&mut output, &hex);
            }
            other => output.push(other),
        }
    }
    output
}

fn push_code_point(output: &mut String, hex: &str) {
    match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
        Some(character) => output.push(character),
        None => output.push(char::REPLACEMENT_CHARACTER),
    }
}

/// Splits a raw template body into literal parts and interpolation sources.
///
/// Returns the literal parts as written (always one more than the
/// expressions) and each expression's source with its byte offset inside
/// `raw`. Pass the parts through [`unescape`] for their cooked value.
pub fn split_template(raw: &str) -> Result<(Vec<&str>, Vec<(usize, &str)>), String> {
    let mut quasis = Vec::new();
    let mut expressions = Vec::new();
    let bytes = raw.as_bytes();
    let mut quasi_start = 0;
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'\\' => index += 2,
            b'$' if bytes.get(index + 1) == Some(&b'{') => {
                quasis.push(&raw[quasi_start..index]);
                let expression_start = index + 2;
                let mut depth = 1;
                let mut cursor = expression_start;
                let mut quote: Option<u8> = None;
                while cursor < bytes.len() {
                    let byte = bytes[cursor];
                    match quote {
                        Some(open) => {
                            if byte == b'\\' {
                                cursor += 1;
                            } else if byte == open {
                                quote = None;
                            }
                        }
                        None => match byte {
                            b'\'' | b'"' => quote = Some(byte),
                            b'{' => depth += 1,
                            b'}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        },
                    }
                    cursor += 1;
                }
                if depth != 0 {
                    return Err("Unterminated template expression".to_string());
                }
                expressions.push((expression_start, &raw[expression_start..cursor]));
                index = cursor + 1;
                quasi_start = index;
            }
            _ => index += 1,
        }
    }
    quasis.push(&raw[quasi_start.min(raw.len())..]);
    Ok((quasis, expressions))
}

/// Formats a number the way JavaScript's `String(number)` does.
pub fn number_to_string(number: f64) -> String {
    if number.is_nan() {
        return "NaN".to_string();
    }
    if number.is_infinite() {
        return if number > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if number == 0.0 {
        return "0".to_string();
    }
    let magnitude = number.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let formatted = format!("{number:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        };
    }
    if number.fract() == 0.0 {
        return format!("{number:.0}");
    }
    format!("{number}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_common_sequences() {
        assert_eq!(unescape(r"a\nb\t\'cA\x42\u{1F600}"), "a\nb\t'cAB😀");
        assert_eq!(unescape("line\\\ncontinued"), "linecontinued");
    }

    #[test]
    fn split_template_parts() {
        let (quasis, expressions) = split_template("a ${x + 1} b ${ {c: 1}.c }!").unwrap();
        assert_eq!(quasis, vec!["a ", " b ", "!"]);
        assert_eq!(expressions, vec![(4, "x + 1"), (15, " {c: 1}.c ")]);
    }

    #[test]
    fn split_template_without_expressions() {
        let (quasis, expressions) = split_template(r"plain \${x}").unwrap();
        assert_eq!(quasis, vec![r"plain \${x}"]);
        assert_eq!(unescape(quasis[0]), "plain ${x}");
        assert!(expressions.is_empty());
    }

    #[test]
    fn unterminated_template_expression() {
        assert!(split_template("${x").is_err());
    }

    #[test]
    fn javascript_number_formatting() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1.5e-7), "1.5e-7");
        assert_eq!(number_to_string(123456789012.0), "123456789012");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }
}
