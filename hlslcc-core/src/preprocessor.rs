//! Preprocessor: macro expansion, conditional inclusion and includes.
//!
//! Consumes directive-mode tokens and produces expanded source text that is
//! re-scanned by the parser stage. `#line` directives are emitted at every
//! file transition so later stages report original positions.

use crate::error::{CompilerError, Result};
use crate::lexer::tokenize_directives;
use crate::report::ReportHandler;
use crate::token::{Token, TokenKind};
use crate::IncludeHandler;
use log::debug;
use std::collections::HashMap;

const MAX_INCLUDE_DEPTH: usize = 64;

#[derive(Debug, Clone)]
struct Macro {
    /// None for object-like macros.
    params: Option<Vec<String>>,
    body: Vec<Token>,
}

#[derive(Debug, Clone, Copy)]
struct IfBlock {
    /// Tokens in the current branch are emitted.
    active: bool,
    /// Some branch of this block has already been taken.
    taken: bool,
    /// The enclosing conditional allowed this block at all.
    parent_active: bool,
}

pub struct Preprocessor<'a, 'r, 'l> {
    reports: &'a mut ReportHandler<'l>,
    include_handler: &'r mut dyn IncludeHandler,
    macros: HashMap<String, Macro>,
    if_stack: Vec<IfBlock>,
    output: String,
    include_depth: usize,
}

impl<'a, 'r, 'l> Preprocessor<'a, 'r, 'l> {
    pub fn new(
        include_handler: &'r mut dyn IncludeHandler,
        reports: &'a mut ReportHandler<'l>,
    ) -> Self {
        Preprocessor {
            reports,
            include_handler,
            macros: HashMap::new(),
            if_stack: Vec::new(),
            output: String::new(),
            include_depth: 0,
        }
    }

    /// Runs the preprocessor. Diagnostics go to the report handler; the
    /// (possibly partial) expansion is always returned, together with the
    /// manifest of macros still defined at the end.
    pub fn process(mut self, source: &str, filename: &str) -> (String, Vec<String>) {
        self.process_source(source, filename);
        if !self.if_stack.is_empty() {
            self.reports
                .error("missing '#endif' directive for open conditional block", None);
        }
        let macros = self.macro_idents();
        (self.output, macros)
    }

    /// Identifiers of all defined macros, sorted for deterministic
    /// statistics.
    pub fn macro_idents(&self) -> Vec<String> {
        let mut idents: Vec<String> = self.macros.keys().cloned().collect();
        idents.sort();
        idents
    }

    fn active(&self) -> bool {
        self.if_stack.iter().all(|block| block.active)
    }

    fn process_source(&mut self, source: &str, filename: &str) {
        let file = self.reports.source_map_mut().intern(filename);
        let tokens = match tokenize_directives(source, file) {
            Ok(tokens) => tokens,
            Err(err) => {
                let area = err.area();
                self.reports.error(&err.to_string(), area);
                return;
            }
        };

        let mut pos = 0;
        while pos < tokens.len() {
            let token = &tokens[pos];
            match token.kind {
                TokenKind::EndOfStream => break,
                TokenKind::Directive => {
                    let line_end = line_end(&tokens, pos);
                    let directive_tokens = &tokens[pos + 1..line_end];
                    self.handle_directive(token, directive_tokens, filename);
                    pos = line_end;
                }
                TokenKind::NewLine => {
                    // Emitted even in inactive blocks so physical rows stay
                    // aligned with the original file.
                    self.output.push('\n');
                    pos += 1;
                }
                TokenKind::Comment => {
                    // A block comment may span lines; re-emit the newlines
                    // it swallowed to keep rows aligned.
                    let spanned = tokens
                        .get(pos + 1)
                        .map(|next| next.pos.row.saturating_sub(token.pos.row))
                        .unwrap_or(0);
                    for _ in 0..spanned {
                        self.output.push('\n');
                    }
                    pos += 1;
                }
                TokenKind::Ident if self.active() && self.macros.contains_key(&token.spell) => {
                    pos = self.expand_macro_call(&tokens, pos, &mut Vec::new());
                }
                _ => {
                    if self.active() {
                        self.output.push_str(&token.spell);
                    }
                    pos += 1;
                }
            }
        }
    }

    fn handle_directive(&mut self, directive: &Token, tokens: &[Token], filename: &str) {
        let args: Vec<&Token> = tokens
            .iter()
            .filter(|t| {
                !matches!(
                    t.kind,
                    TokenKind::WhiteSpace | TokenKind::LineBreak | TokenKind::Comment
                )
            })
            .collect();

        match directive.spell.as_str() {
            "define" => {
                if self.active() {
                    self.handle_define(directive, tokens);
                }
            }
            "undef" => {
                if self.active() {
                    match args.first() {
                        Some(ident) if ident.kind == TokenKind::Ident => {
                            // Undefining an unknown macro is silently accepted.
                            self.macros.remove(&ident.spell);
                        }
                        _ => self.reports.error(
                            "expected identifier after '#undef' directive",
                            Some(directive.area()),
                        ),
                    }
                }
            }
            "ifdef" | "ifndef" => {
                let parent_active = self.active();
                let mut active = false;
                if parent_active {
                    match args.first() {
                        Some(ident) if ident.kind == TokenKind::Ident => {
                            let defined = self.macros.contains_key(&ident.spell);
                            active = if directive.spell == "ifdef" { defined } else { !defined };
                        }
                        _ => self.reports.error(
                            &format!("expected identifier after '#{}' directive", directive.spell),
                            Some(directive.area()),
                        ),
                    }
                }
                self.if_stack.push(IfBlock {
                    active,
                    taken: active,
                    parent_active,
                });
            }
            "if" => {
                let parent_active = self.active();
                let active = parent_active && self.eval_condition(directive, &args);
                self.if_stack.push(IfBlock {
                    active,
                    taken: active,
                    parent_active,
                });
            }
            "elif" => match self.if_stack.pop() {
                Some(block) => {
                    let active =
                        block.parent_active && !block.taken && self.eval_condition(directive, &args);
                    self.if_stack.push(IfBlock {
                        active,
                        taken: block.taken || active,
                        parent_active: block.parent_active,
                    });
                }
                None => self.reports.error(
                    "'#elif' directive without open conditional block",
                    Some(directive.area()),
                ),
            },
            "else" => match self.if_stack.pop() {
                Some(block) => {
                    let active = block.parent_active && !block.taken;
                    self.if_stack.push(IfBlock {
                        active,
                        taken: true,
                        parent_active: block.parent_active,
                    });
                }
                None => self.reports.error(
                    "'#else' directive without open conditional block",
                    Some(directive.area()),
                ),
            },
            "endif" => {
                if self.if_stack.pop().is_none() {
                    self.reports.error(
                        "'#endif' directive without open conditional block",
                        Some(directive.area()),
                    );
                }
            }
            "include" => {
                if self.active() {
                    self.handle_include(directive, &args, filename);
                }
            }
            "line" => {
                if self.active() {
                    // Passed through for the scanner's origin remapping; the
                    // line's own newline follows in the main loop.
                    self.output.push_str("#line");
                    for token in tokens {
                        self.output.push_str(&token.spell);
                    }
                }
            }
            "error" => {
                if self.active() {
                    let text: String = tokens.iter().map(|t| t.spell.as_str()).collect();
                    self.reports
                        .error(text.trim(), Some(directive.area()));
                }
            }
            "pragma" => {
                if self.active() {
                    let text: String = args.iter().map(|t| t.spell.as_str()).collect::<Vec<_>>().join(" ");
                    self.reports.warning(
                        &format!("unknown pragma ignored: '{}'", text),
                        Some(directive.area()),
                    );
                }
            }
            other => {
                if self.active() {
                    self.reports.error(
                        &format!("unknown preprocessor directive: '#{}'", other),
                        Some(directive.area()),
                    );
                }
            }
        }
    }

    fn handle_define(&mut self, directive: &Token, tokens: &[Token]) {
        // Skip leading whitespace before the macro name.
        let mut iter = tokens.iter().enumerate();
        let (name_idx, name) = loop {
            match iter.next() {
                Some((i, t)) if t.kind == TokenKind::Ident => break (i, t.spell.clone()),
                Some((_, t))
                    if matches!(t.kind, TokenKind::WhiteSpace | TokenKind::LineBreak) => {}
                _ => {
                    self.reports.error(
                        "expected identifier after '#define' directive",
                        Some(directive.area()),
                    );
                    return;
                }
            }
        };

        let mut body_start = name_idx + 1;
        let mut params = None;

        // A '(' immediately after the name (no whitespace) opens a
        // parameter list.
        if tokens.get(name_idx + 1).map(|t| t.kind) == Some(TokenKind::LParen) {
            let mut list = Vec::new();
            let mut idx = name_idx + 2;
            loop {
                match tokens.get(idx) {
                    Some(t) if t.kind == TokenKind::Ident => {
                        list.push(t.spell.clone());
                        idx += 1;
                    }
                    Some(t) if t.kind == TokenKind::RParen => {
                        idx += 1;
                        break;
                    }
                    Some(t)
                        if matches!(
                            t.kind,
                            TokenKind::Comma | TokenKind::WhiteSpace | TokenKind::LineBreak
                        ) =>
                    {
                        idx += 1;
                    }
                    _ => {
                        self.reports.error(
                            "malformed parameter list in '#define' directive",
                            Some(directive.area()),
                        );
                        return;
                    }
                }
            }
            params = Some(list);
            body_start = idx;
        }

        let body: Vec<Token> = tokens[body_start.min(tokens.len())..]
            .iter()
            .filter(|t| !matches!(t.kind, TokenKind::LineBreak | TokenKind::Comment))
            .cloned()
            .collect();
        let body = trim_whitespace(body);

        debug!("define macro '{}' ({} body tokens)", name, body.len());

        if let Some(previous) = self.macros.get(&name) {
            let same = previous.params == params
                && previous.body.iter().map(|t| &t.spell).eq(body.iter().map(|t| &t.spell));
            if !same {
                self.reports.warning(
                    &format!("redefinition of macro '{}'", name),
                    Some(directive.area()),
                );
            }
        }

        self.macros.insert(name, Macro { params, body });
    }

    fn handle_include(&mut self, directive: &Token, args: &[&Token], current_file: &str) {
        let (name, use_search_paths) = match args.first() {
            Some(t) if t.kind == TokenKind::StringLiteral => {
                (t.spell_content().to_string(), false)
            }
            Some(t) if t.kind == TokenKind::BinaryOp && t.spell == "<" => {
                // Reconstruct the path between the angle brackets.
                let mut name = String::new();
                for token in &args[1..] {
                    if token.kind == TokenKind::BinaryOp && token.spell == ">" {
                        break;
                    }
                    name.push_str(&token.spell);
                }
                (name, true)
            }
            _ => {
                self.reports.error(
                    "expected file name after '#include' directive",
                    Some(directive.area()),
                );
                return;
            }
        };

        if self.include_depth >= MAX_INCLUDE_DEPTH {
            self.reports.error(
                &format!("maximum include depth exceeded with '{}'", name),
                Some(directive.area()),
            );
            return;
        }

        debug!("include '{}' (search paths: {})", name, use_search_paths);

        let source = match self.include_handler.include(&name, use_search_paths) {
            Ok(source) => source,
            Err(err) => {
                self.reports
                    .error(&err.to_string(), Some(directive.area()));
                return;
            }
        };

        self.output.push_str(&format!("#line 1 \"{}\"\n", name));
        self.include_depth += 1;
        self.process_source(&source, &name);
        self.include_depth -= 1;
        if !self.output.ends_with('\n') {
            self.output.push('\n');
        }
        // The include directive's own newline still follows in the main
        // loop, so the next physical line maps back to the row after the
        // directive.
        self.output.push_str(&format!(
            "#line {} \"{}\"\n",
            directive.pos.row,
            current_file
        ));
    }

    /// Expands the macro call starting at `pos` (an identifier token) and
    /// returns the index of the first unconsumed token.
    fn expand_macro_call(
        &mut self,
        tokens: &[Token],
        pos: usize,
        expansion_stack: &mut Vec<String>,
    ) -> usize {
        let name = tokens[pos].spell.clone();
        let makro = self.macros.get(&name).cloned().expect("macro must exist");

        let mut next = pos + 1;
        let mut arguments: Vec<Vec<Token>> = Vec::new();

        if makro.params.is_some() {
            // Function-like: without an argument list the identifier stays.
            let mut probe = next;
            while tokens.get(probe).map(|t| t.kind) == Some(TokenKind::WhiteSpace) {
                probe += 1;
            }
            if tokens.get(probe).map(|t| t.kind) != Some(TokenKind::LParen) {
                self.output.push_str(&name);
                return next;
            }
            let (args, after) = collect_macro_arguments(tokens, probe);
            arguments = args;
            next = after;
        }

        if expansion_stack.contains(&name) {
            // Self-referential macros are not re-expanded.
            self.output.push_str(&name);
            return next;
        }

        expansion_stack.push(name);
        let expansion = self.substitute_body(&makro, &arguments, expansion_stack);
        self.emit_expanded(&expansion, expansion_stack);
        expansion_stack.pop();

        next
    }

    /// Replaces parameters in the macro body and joins '##' pairs.
    fn substitute_body(
        &mut self,
        makro: &Macro,
        arguments: &[Vec<Token>],
        _expansion_stack: &[String],
    ) -> Vec<Token> {
        let empty = Vec::new();
        let params = makro.params.as_ref().unwrap_or(&empty);

        let mut substituted: Vec<Token> = Vec::new();
        for token in &makro.body {
            if token.kind == TokenKind::Ident {
                if let Some(idx) = params.iter().position(|p| p == &token.spell) {
                    let arg = arguments.get(idx).map(Vec::as_slice).unwrap_or(&[]);
                    substituted.extend(arg.iter().cloned());
                    continue;
                }
            }
            substituted.push(token.clone());
        }

        // '##' concatenation: drop the operator and join its neighbors.
        let mut joined: Vec<Token> = Vec::new();
        let mut iter = substituted.into_iter().peekable();
        while let Some(token) = iter.next() {
            if token.kind == TokenKind::DirectiveConcat {
                // Strip whitespace before and after.
                while joined.last().map(|t: &Token| t.kind) == Some(TokenKind::WhiteSpace) {
                    joined.pop();
                }
                while iter.peek().map(|t| t.kind) == Some(TokenKind::WhiteSpace) {
                    iter.next();
                }
                if let (Some(last), Some(next)) = (joined.last_mut(), iter.next()) {
                    last.spell.push_str(&next.spell);
                }
                continue;
            }
            joined.push(token);
        }
        joined
    }

    /// Emits substituted tokens, re-expanding macro names that appear in
    /// the result.
    fn emit_expanded(&mut self, tokens: &[Token], expansion_stack: &mut Vec<String>) {
        let mut pos = 0;
        while pos < tokens.len() {
            let token = &tokens[pos];
            if token.kind == TokenKind::Ident
                && self.macros.contains_key(&token.spell)
                && !expansion_stack.contains(&token.spell)
            {
                pos = self.expand_macro_call(tokens, pos, expansion_stack);
            } else {
                self.output.push_str(&token.spell);
                pos += 1;
            }
        }
    }

    /* ----- Conditional expressions ----- */

    fn eval_condition(&mut self, directive: &Token, args: &[&Token]) -> bool {
        // Resolve 'defined' operators and expand macros first.
        let mut resolved: Vec<Token> = Vec::new();
        let mut idx = 0;
        while idx < args.len() {
            let token = args[idx];
            if token.kind == TokenKind::Ident && token.spell == "defined" {
                let (ident, after) = match args.get(idx + 1) {
                    Some(t) if t.kind == TokenKind::Ident => (Some(&t.spell), idx + 2),
                    Some(t) if t.kind == TokenKind::LParen => match args.get(idx + 2) {
                        Some(t2) if t2.kind == TokenKind::Ident => (Some(&t2.spell), idx + 4),
                        _ => (None, idx + 1),
                    },
                    _ => (None, idx + 1),
                };
                match ident {
                    Some(ident) => {
                        let value = if self.macros.contains_key(ident) { "1" } else { "0" };
                        resolved.push(Token::new(TokenKind::IntLiteral, value, token.pos));
                        idx = after;
                    }
                    None => {
                        self.reports.error(
                            "expected identifier after 'defined' operator",
                            Some(token.area()),
                        );
                        return false;
                    }
                }
            } else if token.kind == TokenKind::Ident {
                match self.macros.get(&token.spell) {
                    Some(makro) if makro.params.is_none() => {
                        resolved.extend(
                            makro
                                .body
                                .iter()
                                .filter(|t| t.kind != TokenKind::WhiteSpace)
                                .cloned(),
                        );
                    }
                    // Unknown identifiers evaluate to 0.
                    _ => resolved.push(Token::new(TokenKind::IntLiteral, "0", token.pos)),
                }
                idx += 1;
            } else {
                resolved.push((*token).clone());
                idx += 1;
            }
        }

        let mut pos = 0;
        match parse_cond_expr(&resolved, &mut pos, 0) {
            Ok(value) => value != 0,
            Err(err) => {
                let area = err.area().or(Some(directive.area()));
                self.reports.error(&err.to_string(), area);
                false
            }
        }
    }
}

/// Index just past the NewLine that terminates the line starting at `pos`.
fn line_end(tokens: &[Token], pos: usize) -> usize {
    let mut idx = pos;
    while idx < tokens.len() {
        match tokens[idx].kind {
            TokenKind::NewLine => return idx,
            TokenKind::EndOfStream => return idx,
            _ => idx += 1,
        }
    }
    idx
}

fn trim_whitespace(mut tokens: Vec<Token>) -> Vec<Token> {
    while tokens.first().map(|t| t.kind) == Some(TokenKind::WhiteSpace) {
        tokens.remove(0);
    }
    while tokens.last().map(|t| t.kind) == Some(TokenKind::WhiteSpace) {
        tokens.pop();
    }
    tokens
}

/// Collects function-like macro arguments starting at the '(' token.
/// Returns the argument token lists and the index after the closing ')'.
fn collect_macro_arguments(tokens: &[Token], lparen: usize) -> (Vec<Vec<Token>>, usize) {
    let mut arguments: Vec<Vec<Token>> = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut depth = 1;
    let mut idx = lparen + 1;

    while idx < tokens.len() {
        let token = &tokens[idx];
        match token.kind {
            TokenKind::LParen => {
                depth += 1;
                current.push(token.clone());
            }
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    idx += 1;
                    break;
                }
                current.push(token.clone());
            }
            TokenKind::Comma if depth == 1 => {
                arguments.push(trim_whitespace(std::mem::take(&mut current)));
            }
            TokenKind::EndOfStream => break,
            _ => current.push(token.clone()),
        }
        idx += 1;
    }

    if !current.is_empty() || !arguments.is_empty() {
        arguments.push(trim_whitespace(current));
    }
    (arguments, idx)
}

/* ----- Integer constant expressions for '#if' ----- */

fn cond_op_precedence(spell: &str) -> Option<u8> {
    let prec = match spell {
        "||" => 1,
        "&&" => 2,
        "|" => 3,
        "^" => 4,
        "&" => 5,
        "==" | "!=" => 6,
        "<" | ">" | "<=" | ">=" => 7,
        "<<" | ">>" => 8,
        "+" | "-" => 9,
        "*" | "/" | "%" => 10,
        _ => return None,
    };
    Some(prec)
}

fn parse_cond_primary(tokens: &[Token], pos: &mut usize) -> Result<i64> {
    let token = tokens.get(*pos).ok_or_else(|| {
        CompilerError::Syntax("unexpected end of conditional expression".to_string(), None)
    })?;
    match token.kind {
        TokenKind::IntLiteral => {
            *pos += 1;
            let value = if let Some(hex) = token
                .spell
                .strip_prefix("0x")
                .or_else(|| token.spell.strip_prefix("0X"))
            {
                i64::from_str_radix(hex, 16)
            } else {
                token.spell.parse()
            };
            value.map_err(|_| {
                CompilerError::Syntax(
                    format!("invalid integer literal '{}'", token.spell),
                    Some(token.area()),
                )
            })
        }
        TokenKind::LParen => {
            *pos += 1;
            let value = parse_cond_expr(tokens, pos, 0)?;
            match tokens.get(*pos) {
                Some(t) if t.kind == TokenKind::RParen => {
                    *pos += 1;
                    Ok(value)
                }
                _ => Err(CompilerError::Syntax(
                    "missing ')' in conditional expression".to_string(),
                    Some(token.area()),
                )),
            }
        }
        TokenKind::UnaryOp if token.spell == "!" => {
            *pos += 1;
            Ok(i64::from(parse_cond_primary(tokens, pos)? == 0))
        }
        TokenKind::UnaryOp if token.spell == "~" => {
            *pos += 1;
            Ok(!parse_cond_primary(tokens, pos)?)
        }
        TokenKind::BinaryOp if token.spell == "-" => {
            *pos += 1;
            Ok(parse_cond_primary(tokens, pos)?.wrapping_neg())
        }
        TokenKind::BinaryOp if token.spell == "+" => {
            *pos += 1;
            parse_cond_primary(tokens, pos)
        }
        _ => Err(CompilerError::Syntax(
            format!("unexpected token '{}' in conditional expression", token.spell),
            Some(token.area()),
        )),
    }
}

fn parse_cond_expr(tokens: &[Token], pos: &mut usize, min_prec: u8) -> Result<i64> {
    let mut lhs = parse_cond_primary(tokens, pos)?;

    while let Some(token) = tokens.get(*pos) {
        if token.kind != TokenKind::BinaryOp {
            break;
        }
        let prec = match cond_op_precedence(&token.spell) {
            Some(prec) if prec >= min_prec => prec,
            _ => break,
        };
        let op = token.spell.clone();
        let op_area = token.area();
        *pos += 1;
        let rhs = parse_cond_expr(tokens, pos, prec + 1)?;

        lhs = match op.as_str() {
            "||" => i64::from(lhs != 0 || rhs != 0),
            "&&" => i64::from(lhs != 0 && rhs != 0),
            "|" => lhs | rhs,
            "^" => lhs ^ rhs,
            "&" => lhs & rhs,
            "==" => i64::from(lhs == rhs),
            "!=" => i64::from(lhs != rhs),
            "<" => i64::from(lhs < rhs),
            ">" => i64::from(lhs > rhs),
            "<=" => i64::from(lhs <= rhs),
            ">=" => i64::from(lhs >= rhs),
            "<<" => lhs.wrapping_shl(rhs as u32),
            ">>" => lhs.wrapping_shr(rhs as u32),
            "+" => lhs.wrapping_add(rhs),
            "-" => lhs.wrapping_sub(rhs),
            "*" => lhs.wrapping_mul(rhs),
            "/" => {
                if rhs == 0 {
                    return Err(CompilerError::Syntax(
                        "division by zero in conditional expression".to_string(),
                        Some(op_area),
                    ));
                }
                lhs.wrapping_div(rhs)
            }
            "%" => {
                if rhs == 0 {
                    return Err(CompilerError::Syntax(
                        "division by zero in conditional expression".to_string(),
                        Some(op_area),
                    ));
                }
                lhs.wrapping_rem(rhs)
            }
            _ => unreachable!("operator filtered by precedence table"),
        };
    }

    Ok(lhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IncludeError, IncludeHandler};
    use std::collections::HashMap as Map;

    struct MapIncludeHandler(Map<String, String>);

    impl IncludeHandler for MapIncludeHandler {
        fn include(
            &mut self,
            filename: &str,
            _use_search_paths: bool,
        ) -> std::result::Result<String, IncludeError> {
            self.0
                .get(filename)
                .cloned()
                .ok_or_else(|| IncludeError::NotFound(filename.to_string()))
        }
    }

    fn run(source: &str) -> (String, usize) {
        run_with_includes(source, Map::new())
    }

    fn run_with_includes(source: &str, includes: Map<String, String>) -> (String, usize) {
        let mut handler = MapIncludeHandler(includes);
        let mut reports = ReportHandler::new(None);
        let pp = Preprocessor::new(&mut handler, &mut reports);
        let (output, _) = pp.process(source, "test.hlsl");
        (output, reports.num_errors())
    }

    #[test]
    fn test_object_macro_expansion() {
        let (out, errors) = run("#define SIZE 16\nint a[SIZE];\n");
        assert_eq!(errors, 0);
        // Directive lines become blank lines so physical rows stay aligned.
        assert_eq!(out, "\nint a[16];\n");
    }

    #[test]
    fn test_function_macro_with_arguments() {
        let (out, errors) = run("#define MAD(a, b, c) ((a) * (b) + (c))\nfloat x = MAD(1, 2, 3);\n");
        assert_eq!(errors, 0);
        assert_eq!(out.trim_start(), "float x = ((1) * (2) + (3));\n");
    }

    #[test]
    fn test_token_concatenation() {
        let (out, errors) = run("#define GLUE(a, b) a##b\nint GLUE(foo, bar);\n");
        assert_eq!(errors, 0);
        assert_eq!(out.trim_start(), "int foobar;\n");
    }

    #[test]
    fn test_conditional_inclusion() {
        let source = "#define MODE 2\n#if MODE == 1\nint a;\n#elif MODE == 2\nint b;\n#else\nint c;\n#endif\n";
        let (out, errors) = run(source);
        assert_eq!(errors, 0);
        assert!(out.contains("int b;"));
        assert!(!out.contains("int a;"));
        assert!(!out.contains("int c;"));
    }

    #[test]
    fn test_defined_operator() {
        let source = "#define FOO 1\n#if defined(FOO) && !defined(BAR)\nint yes;\n#endif\n";
        let (out, errors) = run(source);
        assert_eq!(errors, 0);
        assert!(out.contains("int yes;"));
    }

    #[test]
    fn test_ifdef_and_undef() {
        let source = "#define A 1\n#undef A\n#ifdef A\nint a;\n#endif\n#ifndef A\nint b;\n#endif\n";
        let (out, errors) = run(source);
        assert_eq!(errors, 0);
        assert!(!out.contains("int a;"));
        assert!(out.contains("int b;"));
    }

    #[test]
    fn test_include_emits_line_directives() {
        let mut includes = Map::new();
        includes.insert("common.hlsli".to_string(), "float4 shared_color;\n".to_string());
        let source = "#include \"common.hlsli\"\nfloat x;\n";
        let (out, errors) = run_with_includes(source, includes);
        assert_eq!(errors, 0);
        assert!(out.contains("#line 1 \"common.hlsli\""));
        assert!(out.contains("float4 shared_color;"));
        assert!(out.contains("#line 1 \"test.hlsl\""));
        assert!(out.contains("float x;"));
    }

    #[test]
    fn test_missing_include_is_error() {
        let (_, errors) = run("#include \"nope.hlsli\"\n");
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_error_directive() {
        let (_, errors) = run("#error something is wrong\n");
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_missing_endif_is_error() {
        let (_, errors) = run("#if 1\nint a;\n");
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_unknown_directive_is_error() {
        let (_, errors) = run("#frobnicate\n");
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_macro_manifest_is_sorted() {
        let mut handler = MapIncludeHandler(Map::new());
        let mut reports = ReportHandler::new(None);
        let mut pp = Preprocessor::new(&mut handler, &mut reports);
        pp.process_source("#define ZETA 1\n#define ALPHA 2\n", "t.hlsl");
        assert_eq!(pp.macro_idents(), vec!["ALPHA".to_string(), "ZETA".to_string()]);
    }

    #[test]
    fn test_inactive_blocks_do_not_expand_includes() {
        // The include handler would fail, but the block is inactive.
        let (out, errors) = run("#if 0\n#include \"nope.hlsli\"\n#endif\nint x;\n");
        assert_eq!(errors, 0);
        assert!(out.contains("int x;"));
    }
}
