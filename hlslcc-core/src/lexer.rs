//! Maximal-munch scanner.
//!
//! Token classes are recognized with nom combinators; a manual loop drives
//! them so that row/column positions, comment retention and the two scan
//! modes (parser vs. preprocessor) stay in one place.

use crate::error::{CompilerError, Result};
use crate::source::{FileId, SourceMap, SourcePos};
use crate::token::{keyword_kind, Token, TokenKind};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, hex_digit1, one_of},
    combinator::{opt, recognize},
    sequence::{pair, preceded, tuple},
    IResult,
};
use std::collections::HashMap;

/// Scan mode. The parser mode drops whitespace and newlines; the
/// preprocessor mode emits them as tokens so directives stay line-scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Parser,
    Preprocessor,
}

/// Three-character operators first, then two, then one: maximal munch.
const OPERATORS: [&str; 34] = [
    "<<=", ">>=", // 3 chars
    "==", "!=", "<=", ">=", "&&", "||", "<<", ">>", "+=", "-=", "*=", "/=", "%=", "|=", "&=",
    "^=", "++", "--", // 2 chars
    "+", "-", "*", "/", "%", "<", ">", "=", "!", "~", "|", "&", "^", "?", // 1 char
];

fn operator_kind(spell: &str) -> TokenKind {
    match spell {
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "<<=" | ">>=" | "|=" | "&=" | "^=" => {
            TokenKind::AssignOp
        }
        "!" | "~" | "++" | "--" => TokenKind::UnaryOp,
        "?" => TokenKind::TernaryOp,
        _ => TokenKind::BinaryOp,
    }
}

fn lex_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn lex_hex_literal(input: &str) -> IResult<&str, &str> {
    recognize(preceded(alt((tag("0x"), tag("0X"))), hex_digit1))(input)
}

fn lex_exponent(input: &str) -> IResult<&str, &str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

/// digit+ '.' digit* | '.' digit+, optional exponent and suffix
fn lex_float_literal(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        alt((
            recognize(tuple((digit1, char('.'), digit0))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(lex_exponent),
        opt(one_of("fFhH")),
    )))(input)
}

/// digit+ with exponent or float suffix still makes a float ("1e5", "2f").
fn lex_float_literal_no_dot(input: &str) -> IResult<&str, &str> {
    recognize(pair(digit1, alt((lex_exponent, recognize(one_of("fFhH"))))))(input)
}

fn lex_string_literal(input: &str) -> IResult<&str, &str> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, '"')) => {}
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Char,
            )))
        }
    }
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Ok((&input[i + 1..], &input[..i + 1]));
        } else if c == '\n' {
            break;
        }
    }
    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Tag,
    )))
}

fn lex_line_comment(input: &str) -> IResult<&str, &str> {
    preceded(tag("//"), take_while(|c| c != '\n'))(input)
}

/// Scans tokens one at a time with position bookkeeping.
pub struct Lexer<'s> {
    source: &'s str,
    offset: usize,
    row: u32,
    col: u32,
    file: FileId,
    mode: ScanMode,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str, file: FileId, mode: ScanMode) -> Self {
        Lexer {
            source,
            offset: 0,
            row: 1,
            col: 1,
            file,
            mode,
        }
    }

    fn pos(&self) -> SourcePos {
        SourcePos::new(self.file, self.row, self.col)
    }

    fn remaining(&self) -> &'s str {
        &self.source[self.offset..]
    }

    fn advance(&mut self, consumed: &str) {
        self.offset += consumed.len();
        for c in consumed.chars() {
            if c == '\n' {
                self.row += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
    }

    /// Scans all tokens, appending an end-of-stream marker.
    pub fn scan_all(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let end = token.kind == TokenKind::EndOfStream;
            match token.kind {
                TokenKind::WhiteSpace | TokenKind::NewLine | TokenKind::LineBreak
                    if self.mode == ScanMode::Parser => {}
                _ => tokens.push(token),
            }
            if end {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token> {
        let pos = self.pos();
        let input = self.remaining();

        if input.is_empty() {
            return Ok(Token::new(TokenKind::EndOfStream, "", pos));
        }

        // Newlines and horizontal whitespace are distinct in preprocessor mode.
        if input.starts_with("\r\n") {
            self.advance(&input[..2]);
            return Ok(Token::new(TokenKind::NewLine, "\n", pos));
        }
        if input.starts_with('\n') {
            self.advance(&input[..1]);
            return Ok(Token::new(TokenKind::NewLine, "\n", pos));
        }
        if let Ok((_, ws)) = take_while1::<_, _, nom::error::Error<&str>>(|c| {
            c == ' ' || c == '\t' || c == '\r'
        })(input)
        {
            self.advance(ws);
            return Ok(Token::new(TokenKind::WhiteSpace, ws, pos));
        }

        // Line continuation inside directives.
        if input.starts_with("\\\r\n") {
            self.advance(&input[..3]);
            return Ok(Token::new(TokenKind::LineBreak, "\\", pos));
        }
        if input.starts_with("\\\n") {
            self.advance(&input[..2]);
            return Ok(Token::new(TokenKind::LineBreak, "\\", pos));
        }

        // Comments.
        if let Ok((_, text)) = lex_line_comment(input) {
            let spell = text.trim().to_string();
            let consumed = &input[..2 + text.len()];
            self.advance(consumed);
            return Ok(Token::new(TokenKind::Comment, spell, pos));
        }
        if input.starts_with("/*") {
            match input[2..].find("*/") {
                Some(end) => {
                    let text = input[2..2 + end].trim().to_string();
                    self.advance(&input[..end + 4]);
                    return Ok(Token::new(TokenKind::Comment, text, pos));
                }
                None => {
                    return Err(CompilerError::Lexical(
                        "unterminated block comment".to_string(),
                        Some(Token::new(TokenKind::Comment, "/*", pos).area()),
                    ))
                }
            }
        }

        // Directives and token concatenation.
        if input.starts_with("##") {
            self.advance(&input[..2]);
            return Ok(Token::new(TokenKind::DirectiveConcat, "##", pos));
        }
        if input.starts_with('#') {
            let after = &input[1..];
            let ws_len = after.len() - after.trim_start_matches([' ', '\t']).len();
            match lex_identifier(&after[ws_len..]) {
                Ok((_, ident)) => {
                    self.advance(&input[..1 + ws_len + ident.len()]);
                    return Ok(Token::new(TokenKind::Directive, ident, pos));
                }
                Err(_) => {
                    self.advance(&input[..1]);
                    return Ok(Token::new(TokenKind::Misc, "#", pos));
                }
            }
        }

        // Literals before operators so "1.5" is not "1" '.' "5",
        // and "..." before '.'.
        if input.starts_with("...") {
            self.advance(&input[..3]);
            return Ok(Token::new(TokenKind::VarArg, "...", pos));
        }
        if let Ok((_, spell)) = lex_float_literal(input) {
            self.advance(spell);
            return Ok(Token::new(TokenKind::FloatLiteral, spell, pos));
        }
        if let Ok((_, spell)) = lex_hex_literal(input) {
            self.advance(spell);
            return Ok(Token::new(TokenKind::IntLiteral, spell, pos));
        }
        if let Ok((_, spell)) = lex_float_literal_no_dot(input) {
            self.advance(spell);
            return Ok(Token::new(TokenKind::FloatLiteral, spell, pos));
        }
        if let Ok((_, spell)) = digit1::<_, nom::error::Error<&str>>(input) {
            self.advance(spell);
            return Ok(Token::new(TokenKind::IntLiteral, spell, pos));
        }

        match lex_string_literal(input) {
            Ok((_, spell)) => {
                self.advance(spell);
                return Ok(Token::new(TokenKind::StringLiteral, spell, pos));
            }
            Err(nom::Err::Failure(_)) => {
                return Err(CompilerError::Lexical(
                    "unterminated string literal".to_string(),
                    Some(Token::new(TokenKind::StringLiteral, "\"", pos).area()),
                ))
            }
            Err(_) => {}
        }

        if let Ok((_, ident)) = lex_identifier(input) {
            self.advance(ident);
            let kind = keyword_kind(ident).unwrap_or(TokenKind::Ident);
            return Ok(Token::new(kind, ident, pos));
        }

        for op in OPERATORS {
            if input.starts_with(op) {
                self.advance(&input[..op.len()]);
                return Ok(Token::new(operator_kind(op), op, pos));
            }
        }

        let kind = match input.as_bytes()[0] {
            b'.' => TokenKind::Dot,
            b':' => TokenKind::Colon,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            other => {
                return Err(CompilerError::Lexical(
                    format!("unknown character '{}'", other as char),
                    Some(Token::new(TokenKind::Misc, "", pos).area()),
                ))
            }
        };
        let spell = &input[..1];
        self.advance(spell);
        Ok(Token::new(kind, spell, pos))
    }
}

/// Tokenizes a source string in parser mode (whitespace dropped, comments
/// kept as tokens for later attachment).
pub fn tokenize(source: &str, file: FileId) -> Result<Vec<Token>> {
    Lexer::new(source, file, ScanMode::Parser).scan_all()
}

/// Tokenizes in preprocessor mode (whitespace, newlines and directives all
/// surface as tokens).
pub fn tokenize_directives(source: &str, file: FileId) -> Result<Vec<Token>> {
    Lexer::new(source, file, ScanMode::Preprocessor).scan_all()
}

/// Removes comment tokens, returning the comment text attached to the index
/// of the token that follows it. Consecutive comment lines are joined.
pub fn split_comments(tokens: Vec<Token>) -> (Vec<Token>, HashMap<usize, String>) {
    let mut stripped = Vec::with_capacity(tokens.len());
    let mut comments = HashMap::new();
    let mut pending: Option<String> = None;

    for token in tokens {
        if token.kind == TokenKind::Comment {
            match pending.as_mut() {
                Some(text) => {
                    text.push('\n');
                    text.push_str(&token.spell);
                }
                None => pending = Some(token.spell),
            }
        } else {
            if let Some(text) = pending.take() {
                comments.insert(stripped.len(), text);
            }
            stripped.push(token);
        }
    }
    (stripped, comments)
}

/// Applies `#line` directives to a parser-mode token stream, rewriting the
/// row and file of all subsequent tokens so the line after the directive
/// carries the declared number. Any other directive is an error: only
/// `#line` may survive preprocessing.
pub fn apply_line_directives(tokens: Vec<Token>, source_map: &mut SourceMap) -> Result<Vec<Token>> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();

    // Current remap: declared row of the line following the directive,
    // the physical row of the directive, and the target file.
    let mut remap: Option<(i64, u32, FileId)> = None;

    while let Some(token) = iter.next() {
        if token.kind == TokenKind::Directive {
            if token.spell != "line" {
                return Err(CompilerError::Lexical(
                    format!(
                        "only '#line' directives are allowed after pre-processing (found '#{}')",
                        token.spell
                    ),
                    Some(token.area()),
                ));
            }
            let line_no = match iter.peek() {
                Some(t) if t.kind == TokenKind::IntLiteral => {
                    let t = iter.next().unwrap();
                    t.spell.parse::<i64>().map_err(|_| {
                        CompilerError::Lexical(
                            "invalid line number in '#line' directive".to_string(),
                            Some(t.area()),
                        )
                    })?
                }
                _ => {
                    return Err(CompilerError::Lexical(
                        "expected integer literal after '#line' directive".to_string(),
                        Some(token.area()),
                    ))
                }
            };
            let file = match iter.peek() {
                Some(t) if t.kind == TokenKind::StringLiteral => {
                    let t = iter.next().unwrap();
                    source_map.intern(t.spell_content())
                }
                _ => remap.map(|(_, _, f)| f).unwrap_or(token.pos.file),
            };
            remap = Some((line_no, token.pos.row, file));
            continue;
        }

        let mut token = token;
        if let Some((line_no, directive_row, file)) = remap {
            let new_row = line_no + i64::from(token.pos.row) - i64::from(directive_row) - 1;
            token.pos.row = new_row.max(0) as u32;
            token.pos.file = file;
        }
        out.push(token);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Token> {
        tokenize(source, FileId(0)).expect("tokenize failed")
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_scan_simple_declaration() {
        let tokens = scan("float4 color = 1.0;");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::VectorType,
                TokenKind::Ident,
                TokenKind::AssignOp,
                TokenKind::FloatLiteral,
                TokenKind::Semicolon,
                TokenKind::EndOfStream,
            ]
        );
        assert_eq!(tokens[0].spell, "float4");
        assert_eq!(tokens[1].pos.col, 8);
    }

    #[test]
    fn test_maximal_munch_operators() {
        let tokens = scan("a <<= b >> c >= d");
        let spells: Vec<&str> = tokens.iter().map(|t| t.spell.as_str()).collect();
        assert_eq!(spells, vec!["a", "<<=", "b", ">>", "c", ">=", "d", ""]);
        assert_eq!(tokens[1].kind, TokenKind::AssignOp);
        assert_eq!(tokens[3].kind, TokenKind::BinaryOp);
    }

    #[test]
    fn test_post_unary_operators() {
        let tokens = scan("i++ + ++j");
        let spells: Vec<&str> = tokens.iter().map(|t| t.spell.as_str()).collect();
        assert_eq!(spells, vec!["i", "++", "+", "++", "j", ""]);
    }

    #[test]
    fn test_hex_and_float_literals() {
        let tokens = scan("0xFF 12 1.5f 2.0e-3 .25 3f");
        assert_eq!(
            kinds(&tokens)[..6],
            [
                TokenKind::IntLiteral,
                TokenKind::IntLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
            ]
        );
    }

    #[test]
    fn test_comment_retention() {
        let tokens = scan("// set up\nfloat x;");
        let (stripped, comments) = split_comments(tokens);
        assert_eq!(stripped[0].kind, TokenKind::ScalarType);
        assert_eq!(comments.get(&0).map(String::as_str), Some("set up"));
    }

    #[test]
    fn test_rows_advance_over_newlines() {
        let tokens = scan("float x;\nfloat y;");
        assert_eq!(tokens[0].pos.row, 1);
        assert_eq!(tokens[3].pos.row, 2);
        assert_eq!(tokens[3].pos.col, 1);
    }

    #[test]
    fn test_unterminated_string_fails() {
        let err = tokenize("\"abc", FileId(0)).unwrap_err();
        assert!(matches!(err, CompilerError::Lexical(_, _)));
    }

    #[test]
    fn test_lexical_round_trip() {
        // Retokenizing the concatenation of token spellings (whitespace
        // separated) yields the same token sequence.
        let source = "float4 main(float3 pos : POSITION) : SV_Position { return float4(pos, 1.0); }";
        let first = scan(source);
        let joined: Vec<String> = first
            .iter()
            .filter(|t| t.kind != TokenKind::EndOfStream)
            .map(|t| t.spell.clone())
            .collect();
        let second = scan(&joined.join(" "));
        assert_eq!(kinds(&first), kinds(&second));
        let spells_first: Vec<&str> = first.iter().map(|t| t.spell.as_str()).collect();
        let spells_second: Vec<&str> = second.iter().map(|t| t.spell.as_str()).collect();
        assert_eq!(spells_first, spells_second);
    }

    #[test]
    fn test_line_directive_remaps_rows_and_file() {
        let mut map = SourceMap::new();
        let main = map.intern("main.hlsl");
        let source = "float a;\n#line 10 \"inc.hlsli\"\nfloat b;\nfloat c;";
        let tokens = tokenize(source, main).unwrap();
        let tokens = apply_line_directives(tokens, &mut map).unwrap();

        // 'a' keeps its original position.
        assert_eq!(tokens[1].spell, "a");
        assert_eq!(tokens[1].pos.row, 1);
        assert_eq!(map.name(tokens[1].pos.file), "main.hlsl");

        // 'b' is the first line after the directive: row 10 in inc.hlsli.
        let b = tokens.iter().find(|t| t.spell == "b").unwrap();
        assert_eq!(b.pos.row, 10);
        assert_eq!(map.name(b.pos.file), "inc.hlsli");

        let c = tokens.iter().find(|t| t.spell == "c").unwrap();
        assert_eq!(c.pos.row, 11);
    }

    #[test]
    fn test_non_line_directive_rejected_after_preprocessing() {
        let mut map = SourceMap::new();
        let file = map.intern("x.hlsl");
        let tokens = tokenize("#define FOO 1\n", file).unwrap();
        let err = apply_line_directives(tokens, &mut map).unwrap_err();
        assert!(matches!(err, CompilerError::Lexical(_, _)));
    }

    #[test]
    fn test_preprocessor_mode_keeps_structure() {
        let tokens = tokenize_directives("#if X\nint a;\n#endif\n", FileId(0)).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Directive);
        assert_eq!(tokens[0].spell, "if");
        assert!(tokens.iter().any(|t| t.kind == TokenKind::NewLine));
    }
}
