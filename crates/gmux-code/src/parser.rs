//! Single-pass text parser.
//!
//! The parser walks the input once, character by character, with no
//! lookahead beyond the next character (needed for the `""` escape). See
//! the grammar in the crate documentation; the states are `Normal`,
//! `InQuotes`, `InParenComment` and `InLineComment`, expressed here as
//! dedicated read functions instead of a state variable.

use crate::code::Code;
use crate::code_type::{CodeType, Keyword};
use crate::parameter::{Parameter, UNNAMED_LETTER};
use crate::CodeParserError;
use gmux_types::CodeChannel;
use std::iter::Peekable;
use std::str::Chars;

/// Parses one line of input into a [`Code`].
pub(crate) fn parse(text: &str, channel: CodeChannel) -> Result<Code, CodeParserError> {
    let mut code = Code::empty(channel);

    if let Some((keyword, argument)) = match_keyword(text) {
        code.code_type = CodeType::Keyword;
        code.keyword = Some(keyword);
        code.keyword_argument = argument;
        return Ok(code);
    }

    let mut chars = text.chars().peekable();

    // Leading whitespace and comments, up to the code letter.
    loop {
        skip_spaces(&mut chars);
        match chars.peek().copied() {
            None => return Ok(code),
            Some(';') => {
                chars.next();
                append_comment(&mut code, &chars.collect::<String>());
                return Ok(code);
            }
            Some('(') => read_paren_comment(&mut chars, &mut code)?,
            Some(c) if c.is_ascii_alphabetic() => break,
            Some(c) => return Err(CodeParserError::MissingCodeType { found: c }),
        }
    }

    // Code letter and major/minor numbers.
    let letter = chars.next().unwrap_or_default();
    code.code_type = CodeType::from_letter(letter)
        .ok_or(CodeParserError::MissingCodeType { found: letter })?;

    let major = read_chunk(&mut chars, &['.', ';', '(']);
    if !major.is_empty() {
        code.major = Some(major.parse().map_err(|_| CodeParserError::InvalidNumber {
            what: "major",
            found: major,
        })?);
    }
    if chars.peek() == Some(&'.') {
        chars.next();
        let minor = read_chunk(&mut chars, &[';', '(']);
        code.minor = Some(minor.parse().map_err(|_| CodeParserError::InvalidNumber {
            what: "minor",
            found: minor,
        })?);
    }

    // A few M-codes take the whole remainder as one file-name or text
    // argument, spaces included (`M28 foo.g`, `M117 hello world`).
    if code.code_type == CodeType::M && takes_raw_argument(code.major) {
        skip_spaces(&mut chars);
        match chars.peek().copied() {
            None => {}
            Some('"') => {
                let value = read_quoted(&mut chars)?;
                code.parameters.push(Parameter::new(UNNAMED_LETTER, value, true));
            }
            Some(';') => {
                chars.next();
                append_comment(&mut code, &chars.collect::<String>());
                return Ok(code);
            }
            Some(_) => {
                let mut value = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ';' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                code.parameters.push(Parameter::new(
                    UNNAMED_LETTER,
                    value.trim_end(),
                    false,
                ));
            }
        }
    }

    // Parameters and trailing comments.
    loop {
        skip_spaces(&mut chars);
        match chars.peek().copied() {
            None => break,
            Some(';') => {
                chars.next();
                append_comment(&mut code, &chars.collect::<String>());
                break;
            }
            Some('(') => read_paren_comment(&mut chars, &mut code)?,
            Some('"') => {
                let value = read_quoted(&mut chars)?;
                code.parameters.push(Parameter::new(UNNAMED_LETTER, value, true));
            }
            Some(c) if c.is_ascii_alphabetic() => {
                chars.next();
                let parameter = match chars.peek().copied() {
                    Some('"') => Parameter::new(c, read_quoted(&mut chars)?, true),
                    Some('{') => Parameter::new(c, read_braced(&mut chars), false),
                    _ => Parameter::new(c, read_chunk(&mut chars, &[';', '(']), false),
                };
                code.parameters.push(parameter);
            }
            Some(_) => {
                // Stray token without a letter; keep it as an unnamed value.
                let value = read_chunk(&mut chars, &[';', '(']);
                code.parameters.push(Parameter::new(UNNAMED_LETTER, value, false));
            }
        }
    }

    Ok(code)
}

/// M-codes whose argument is a raw file name or message, taken verbatim up
/// to the end of line (or a `;` comment) instead of letter/value pairs.
fn takes_raw_argument(major: Option<i32>) -> bool {
    matches!(major, Some(23 | 28 | 30 | 32 | 36 | 38 | 117))
}

/// Checks whether the line starts with a standalone meta keyword.
fn match_keyword(text: &str) -> Option<(Keyword, Option<String>)> {
    let stripped = text.trim_start();
    let word_len = stripped
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .count();
    let keyword = Keyword::parse(&stripped[..word_len].to_ascii_lowercase())?;

    // Must be a whole word: `echo` yes, `echos` no.
    match stripped[word_len..].chars().next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => None,
        _ => {
            let argument = stripped[word_len..].trim();
            let argument = (!argument.is_empty()).then(|| argument.to_string());
            Some((keyword, argument))
        }
    }
}

fn skip_spaces(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

/// Reads until whitespace, end of line, or one of `terminators`. The
/// terminator is left in the stream.
fn read_chunk(chars: &mut Peekable<Chars<'_>>, terminators: &[char]) -> String {
    let mut chunk = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || terminators.contains(&c) {
            break;
        }
        chunk.push(c);
        chars.next();
    }
    chunk
}

/// Reads a quoted string. `""` unescapes to a single quote.
fn read_quoted(chars: &mut Peekable<Chars<'_>>) -> Result<String, CodeParserError> {
    chars.next(); // opening quote
    let mut value = String::new();
    loop {
        match chars.next() {
            None => return Err(CodeParserError::UnterminatedString),
            Some('"') => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    value.push('"');
                } else {
                    return Ok(value);
                }
            }
            Some(c) => value.push(c),
        }
    }
}

/// Reads a brace-balanced `{…}` expression token, braces included.
/// Quoted runs inside the expression do not count towards the balance.
fn read_braced(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut value = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    while let Some(&c) = chars.peek() {
        match c {
            '"' => in_quotes = !in_quotes,
            '{' if !in_quotes => depth += 1,
            '}' if !in_quotes => {
                value.push(c);
                chars.next();
                depth -= 1;
                if depth == 0 {
                    return value;
                }
                continue;
            }
            _ => {}
        }
        value.push(c);
        chars.next();
    }
    value
}

fn read_paren_comment(
    chars: &mut Peekable<Chars<'_>>,
    code: &mut Code,
) -> Result<(), CodeParserError> {
    chars.next(); // opening paren
    let mut content = String::new();
    loop {
        match chars.next() {
            None => return Err(CodeParserError::UnterminatedComment),
            Some(')') => {
                append_comment(code, &content);
                return Ok(());
            }
            Some(c) => content.push(c),
        }
    }
}

fn append_comment(code: &mut Code, content: &str) {
    match &mut code.comment {
        Some(existing) => existing.push_str(content),
        None => code.comment = Some(content.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Code, CodeParserError> {
        Code::parse(text)
    }

    // ── Well-formed codes ────────────────────────────────────

    #[test]
    fn simple_move() {
        let code = parse("G1 X10.5 Y-3 ; move").unwrap();
        assert_eq!(code.code_type, CodeType::G);
        assert_eq!(code.major, Some(1));
        assert_eq!(code.minor, None);
        assert_eq!(code.parameters.len(), 2);
        assert_eq!(code.parameter('X').unwrap().as_f32().unwrap(), 10.5);
        assert_eq!(code.parameter('Y').unwrap().as_f32().unwrap(), -3.0);
        assert_eq!(code.comment.as_deref(), Some(" move"));
    }

    #[test]
    fn escaped_quotes() {
        let code = parse("M117 \"Hello \"\"world\"\"\"").unwrap();
        assert_eq!(code.major, Some(117));
        assert_eq!(code.parameters.len(), 1);
        let param = &code.parameters[0];
        assert_eq!(param.letter, UNNAMED_LETTER);
        assert!(param.quoted);
        assert_eq!(param.value, "Hello \"world\"");
    }

    #[test]
    fn minor_number() {
        let code = parse("G53.4").unwrap();
        assert_eq!(code.major, Some(53));
        assert_eq!(code.minor, Some(4));
        assert_eq!(code.short_form(), "G53.4");
    }

    #[test]
    fn quoted_parameter_value() {
        let code = parse("M98 P\"0:/macros/home.g\"").unwrap();
        let param = code.parameter('P').unwrap();
        assert!(param.quoted);
        assert_eq!(param.value, "0:/macros/home.g");
    }

    #[test]
    fn flag_parameter_without_value() {
        let code = parse("M84 X E").unwrap();
        assert_eq!(code.parameter('X').unwrap().value, "");
        assert_eq!(code.parameter('E').unwrap().value, "");
    }

    #[test]
    fn bare_tool_change() {
        let code = parse("T").unwrap();
        assert_eq!(code.code_type, CodeType::T);
        assert_eq!(code.major, None);
        assert_eq!(code.short_form(), "T");

        let deselect = parse("T-1").unwrap();
        assert_eq!(deselect.major, Some(-1));
    }

    #[test]
    fn lowercase_letters() {
        let code = parse("g28 x y").unwrap();
        assert_eq!(code.code_type, CodeType::G);
        assert_eq!(code.major, Some(28));
        assert!(code.parameter('X').is_some());
        assert!(code.parameter('y').is_some());
    }

    #[test]
    fn expression_parameter_keeps_spaces() {
        let code = parse("G1 X{move.axes[0].max - 5} F6000").unwrap();
        let x = code.parameter('X').unwrap();
        assert!(x.is_expression());
        assert_eq!(x.value, "{move.axes[0].max - 5}");
        assert_eq!(code.parameter('F').unwrap().as_i32().unwrap(), 6000);
    }

    #[test]
    fn raw_file_name_argument() {
        let code = parse("M28 foo.g").unwrap();
        let param = &code.parameters[0];
        assert_eq!(param.letter, UNNAMED_LETTER);
        assert_eq!(param.value, "foo.g");
        assert!(!param.quoted);

        let spaced = parse("M30 sub dir/my file.g ; trailing").unwrap();
        assert_eq!(spaced.parameters[0].value, "sub dir/my file.g");
        assert_eq!(spaced.comment.as_deref(), Some(" trailing"));

        let message = parse("M117 hello world").unwrap();
        assert_eq!(message.parameters[0].value, "hello world");
    }

    // ── Comments ─────────────────────────────────────────────

    #[test]
    fn comment_only_line() {
        let code = parse("; just a note").unwrap();
        assert_eq!(code.code_type, CodeType::Comment);
        assert_eq!(code.comment.as_deref(), Some(" just a note"));
        assert!(code.parameters.is_empty());
    }

    #[test]
    fn empty_line_is_comment() {
        let code = parse("").unwrap();
        assert_eq!(code.code_type, CodeType::Comment);
        assert_eq!(code.comment, None);

        let blank = parse("   \t ").unwrap();
        assert_eq!(blank.code_type, CodeType::Comment);
    }

    #[test]
    fn paren_comment_is_plain_comment() {
        let code = parse("G4 (dwell a while) S2").unwrap();
        assert_eq!(code.major, Some(4));
        assert_eq!(code.comment.as_deref(), Some("dwell a while"));
        assert_eq!(code.parameter('S').unwrap().as_i32().unwrap(), 2);
    }

    #[test]
    fn multiple_comments_concatenate() {
        let code = parse("G1 (a) X1 (b) ; c").unwrap();
        assert_eq!(code.comment.as_deref(), Some("ab c"));
    }

    // ── Keywords ─────────────────────────────────────────────

    #[test]
    fn echo_keyword() {
        let code = parse("echo \"hello\"").unwrap();
        assert_eq!(code.code_type, CodeType::Keyword);
        assert_eq!(code.keyword, Some(Keyword::Echo));
        assert_eq!(code.keyword_argument.as_deref(), Some("\"hello\""));
    }

    #[test]
    fn control_flow_keywords() {
        let code = parse("if job.file.size > 0").unwrap();
        assert_eq!(code.keyword, Some(Keyword::If));
        assert_eq!(code.keyword_argument.as_deref(), Some("job.file.size > 0"));

        let bare = parse("else").unwrap();
        assert_eq!(bare.keyword, Some(Keyword::Else));
        assert_eq!(bare.keyword_argument, None);
    }

    #[test]
    fn keyword_must_be_whole_word() {
        // `echos` is not a keyword, and not a code either.
        assert!(matches!(
            parse("echos 1"),
            Err(CodeParserError::MissingCodeType { found: 'e' })
        ));
    }

    // ── Failure modes ────────────────────────────────────────

    #[test]
    fn unterminated_string_rejected() {
        assert_eq!(
            parse("M117 \"no end").unwrap_err(),
            CodeParserError::UnterminatedString
        );
        assert_eq!(
            parse("M98 P\"half").unwrap_err(),
            CodeParserError::UnterminatedString
        );
    }

    #[test]
    fn unterminated_paren_comment_rejected() {
        assert_eq!(
            parse("G1 (never closed").unwrap_err(),
            CodeParserError::UnterminatedComment
        );
    }

    #[test]
    fn non_integer_major_rejected() {
        match parse("G1X10").unwrap_err() {
            CodeParserError::InvalidNumber { what, found } => {
                assert_eq!(what, "major");
                assert_eq!(found, "1X10");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_integer_minor_rejected() {
        match parse("G1.2b").unwrap_err() {
            CodeParserError::InvalidNumber { what, .. } => assert_eq!(what, "minor"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn garbage_start_rejected() {
        assert!(matches!(
            parse("!estop"),
            Err(CodeParserError::MissingCodeType { found: '!' })
        ));
    }

    // ── Round trips ──────────────────────────────────────────

    #[test]
    fn render_parse_round_trip() {
        let samples = [
            "G1 X10.5 Y-3 ; move",
            "M117 \"Hello \"\"world\"\"\"",
            "M98 P\"0:/macros/home.g\"",
            "G53.4 X0",
            "T2",
            "M84 X E",
            "M561",
            "; standalone comment",
        ];
        for text in samples {
            let code = parse(text).unwrap();
            let rendered = code.to_string();
            let reparsed = parse(&rendered)
                .unwrap_or_else(|e| panic!("re-parse of '{rendered}' failed: {e}"));
            assert_eq!(code.code_type, reparsed.code_type, "{text}");
            assert_eq!(code.major, reparsed.major, "{text}");
            assert_eq!(code.minor, reparsed.minor, "{text}");
            assert_eq!(code.parameters, reparsed.parameters, "{text}");
            assert_eq!(code.comment, reparsed.comment, "{text}");
        }
    }
}
