//! Recursive-descent parser with one-token lookahead.
//!
//! The grammar is not context free: `( IDENT ) EXPR` is a cast expression
//! iff IDENT names a type in the current scope, and a bracketed expression
//! otherwise. The parser therefore maintains a scoped type-name table fed
//! by every `typedef` and named `struct`, with pre-defined aliases (DWORD,
//! FLOAT, VECTOR, MATRIX, STRING) registered at program start.

use crate::ast::*;
use crate::error::{CompilerError, Result};
use crate::eval::{evaluate_const_expr, Variant};
use crate::lexer::{apply_line_directives, split_comments, tokenize};
use crate::report::ReportHandler;
use crate::source::SourceArea;
use crate::token::{Token, TokenKind};
use crate::ty::{BufferType, DataType, TypeDenoter, UniformBufferType};
use crate::ShaderTarget;
use log::trace;
use std::collections::{HashMap, HashSet};

/// Pre-defined type aliases registered before the first token is parsed.
const PRE_DEFINED_TYPE_ALIASES: [(&str, &str); 5] = [
    ("DWORD", "int"),
    ("FLOAT", "float"),
    ("VECTOR", "float4"),
    ("MATRIX", "float4x4"),
    ("STRING", "string"),
];

#[derive(Debug, Clone, Copy, Default)]
struct ParsingState {
    /// A template argument list (`vector<...>`, `Texture2D<...>`) is being
    /// parsed, so '<' and '>' are not binary operators.
    active_template: bool,
}

pub struct Parser<'a, 'l> {
    tokens: Vec<Token>,
    comments: HashMap<usize, String>,
    current: usize,
    type_names: Vec<HashSet<String>>,
    parsing_states: Vec<ParsingState>,
    reports: &'a mut ReportHandler<'l>,
    inside_uniform_buffer: bool,
    struct_nesting: u32,
}

/// Parses preprocessed source text into a program. Returns `None` after
/// reporting at least one error.
pub fn parse_source(
    source: &str,
    filename: &str,
    reports: &mut ReportHandler<'_>,
) -> Option<Program> {
    let file = reports.source_map_mut().intern(filename);

    let tokens = match tokenize(source, file) {
        Ok(tokens) => tokens,
        Err(err) => {
            let area = err.area();
            reports.error(&err.to_string(), area);
            return None;
        }
    };
    let tokens = match apply_line_directives(tokens, reports.source_map_mut()) {
        Ok(tokens) => tokens,
        Err(err) => {
            let area = err.area();
            reports.error(&err.to_string(), area);
            return None;
        }
    };
    let (tokens, comments) = split_comments(tokens);

    let mut parser = Parser {
        tokens,
        comments,
        current: 0,
        type_names: Vec::new(),
        parsing_states: Vec::new(),
        reports,
        inside_uniform_buffer: false,
        struct_nesting: 0,
    };

    match parser.parse_program() {
        Ok(program) => {
            if parser.reports.has_errors() {
                None
            } else {
                Some(program)
            }
        }
        Err(err) => {
            let area = err.area();
            parser.reports.error(&err.to_string(), area);
            None
        }
    }
}

impl<'a, 'l> Parser<'a, 'l> {
    /* ----- Token helpers ----- */

    fn tkn(&self) -> &Token {
        self.tokens
            .get(self.current)
            .unwrap_or_else(|| self.tokens.last().expect("token stream is never empty"))
    }

    fn kind(&self) -> TokenKind {
        self.tkn().kind
    }

    fn is(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn is_spell(&self, kind: TokenKind, spell: &str) -> bool {
        self.kind() == kind && self.tkn().spell == spell
    }

    fn area(&self) -> SourceArea {
        self.tkn().area()
    }

    fn accept_it(&mut self) -> Token {
        let token = self.tkn().clone();
        if self.current + 1 < self.tokens.len() {
            self.current += 1;
        }
        token
    }

    fn accept(&mut self, kind: TokenKind) -> Result<Token> {
        if self.is(kind) {
            Ok(self.accept_it())
        } else {
            self.error_unexpected(kind.describe())
        }
    }

    fn accept_spell(&mut self, kind: TokenKind, spell: &str) -> Result<Token> {
        if self.is_spell(kind, spell) {
            Ok(self.accept_it())
        } else {
            self.error_unexpected(&format!("'{}'", spell))
        }
    }

    fn semi(&mut self) -> Result<()> {
        self.accept(TokenKind::Semicolon)?;
        Ok(())
    }

    fn error<T>(&self, message: &str) -> Result<T> {
        Err(CompilerError::Syntax(message.to_string(), Some(self.area())))
    }

    fn error_unexpected<T>(&self, expected: &str) -> Result<T> {
        let got = if self.tkn().spell.is_empty() {
            self.kind().describe().to_string()
        } else {
            format!("'{}'", self.tkn().spell)
        };
        self.error(&format!("expected {}, got {}", expected, got))
    }

    fn warning(&mut self, message: &str, area: SourceArea) {
        self.reports.warning(message, Some(area));
    }

    /* ----- Parsing state ----- */

    fn push_parsing_state(&mut self, state: ParsingState) {
        self.parsing_states.push(state);
    }

    fn pop_parsing_state(&mut self) {
        self.parsing_states.pop();
    }

    fn active_template(&self) -> bool {
        self.parsing_states
            .last()
            .map(|s| s.active_template)
            .unwrap_or(false)
    }

    /* ----- Type-name table ----- */

    fn open_scope(&mut self) {
        self.type_names.push(HashSet::new());
    }

    fn close_scope(&mut self) {
        self.type_names.pop();
    }

    fn register_type_name(&mut self, ident: &str) {
        if let Some(scope) = self.type_names.last_mut() {
            scope.insert(ident.to_string());
        }
    }

    fn is_registered_type_name(&self, ident: &str) -> bool {
        self.type_names.iter().rev().any(|scope| scope.contains(ident))
    }

    /* ----- Classification helpers ----- */

    fn is_data_type(&self) -> bool {
        self.is_base_data_type()
            || matches!(
                self.kind(),
                TokenKind::Vector
                    | TokenKind::Matrix
                    | TokenKind::Texture
                    | TokenKind::StorageBuffer
                    | TokenKind::Sampler
                    | TokenKind::SamplerState
            )
    }

    fn is_base_data_type(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::ScalarType
                | TokenKind::VectorType
                | TokenKind::MatrixType
                | TokenKind::StringType
        )
    }

    fn is_literal(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::BoolLiteral
                | TokenKind::IntLiteral
                | TokenKind::FloatLiteral
                | TokenKind::StringLiteral
        )
    }

    fn is_arithmetic_unary(&self) -> bool {
        self.is_spell(TokenKind::BinaryOp, "-") || self.is_spell(TokenKind::BinaryOp, "+")
    }

    /* ----- Program ----- */

    fn parse_program(&mut self) -> Result<Program> {
        let mut program = Program::new();

        self.open_scope();

        for (alias, base) in PRE_DEFINED_TYPE_ALIASES {
            self.register_type_name(alias);
            let data_type = DataType::from_keyword(base)
                .map(TypeDenoter::Base)
                .unwrap_or(TypeDenoter::Base(DataType::String));
            let mut stmt = Stmt::new(
                StmtKind::AliasDecl(AliasDeclStmt {
                    struct_decl: None,
                    alias_decls: vec![AliasDecl {
                        ident: alias.to_string(),
                        type_denoter: data_type,
                        area: SourceArea::ignore(),
                    }],
                }),
                SourceArea::ignore(),
            );
            stmt.flags.set(Flags::DISABLE_CODEGEN);
            program.global_stmts.push(stmt);
        }

        loop {
            while self.is(TokenKind::Semicolon) || self.is(TokenKind::Technique) {
                if self.is(TokenKind::Technique) {
                    self.parse_and_ignore_technique()?;
                } else {
                    self.accept_it();
                }
            }

            if self.is(TokenKind::EndOfStream) {
                break;
            }

            let stmt = self.parse_stmt_with_comment(Self::parse_global_stmt)?;
            program.global_stmts.push(stmt);
        }

        self.close_scope();

        Ok(program)
    }

    fn parse_stmt_with_comment(
        &mut self,
        parse: fn(&mut Self) -> Result<Stmt>,
    ) -> Result<Stmt> {
        let comment = self.comments.get(&self.current).cloned();
        let mut stmt = parse(self)?;
        stmt.comment = comment;
        Ok(stmt)
    }

    fn parse_global_stmt(&mut self) -> Result<Stmt> {
        trace!("parse_global_stmt: next token = {:?}", self.kind());
        match self.kind() {
            TokenKind::Sampler | TokenKind::SamplerState => self.parse_sampler_decl_stmt(),
            TokenKind::Texture | TokenKind::StorageBuffer => self.parse_texture_decl_stmt(),
            TokenKind::UniformBuffer => self.parse_buffer_decl_stmt(),
            TokenKind::Typedef => self.parse_alias_decl_stmt(),
            TokenKind::TypeModifier | TokenKind::StorageClass => self.parse_var_decl_stmt(),
            TokenKind::LBracket | TokenKind::Void | TokenKind::Inline => {
                self.parse_function_decl(None, None)
            }
            _ => self.parse_struct_or_var_or_function_decl_stmt(),
        }
    }

    /// Disambiguates `struct S {...};`, `struct S {...} v;`, global
    /// variables, and functions, all of which start with a type.
    fn parse_struct_or_var_or_function_decl_stmt(&mut self) -> Result<Stmt> {
        let area = self.area();
        let var_type = self.parse_var_type(false)?;

        if var_type.struct_decl.is_some() && self.is(TokenKind::Semicolon) {
            self.semi()?;
            let struct_decl = var_type.struct_decl.unwrap();
            return Ok(Stmt::new(
                StmtKind::StructDecl(StructDeclStmt { struct_decl }),
                area,
            ));
        }

        let ident_tkn = self.accept(TokenKind::Ident)?;

        if self.is(TokenKind::LParen) {
            self.parse_function_decl(Some(var_type), Some(ident_tkn))
        } else {
            let var_decls = self.parse_var_decl_list(Some(ident_tkn))?;
            self.semi()?;
            Ok(Stmt::new(
                StmtKind::VarDecl(VarDeclStmt {
                    input_modifier: None,
                    storage_classes: Vec::new(),
                    type_modifiers: Vec::new(),
                    var_type,
                    var_decls,
                    area,
                }),
                area,
            ))
        }
    }

    /* ----- Declarations ----- */

    fn parse_function_decl(
        &mut self,
        return_type: Option<VarType>,
        ident_tkn: Option<Token>,
    ) -> Result<Stmt> {
        let mut attribs = Vec::new();
        let return_type = match return_type {
            Some(ty) => ty,
            None => {
                if self.is(TokenKind::Inline) {
                    self.accept_it();
                }
                attribs = self.parse_attribute_list()?;
                if self.is(TokenKind::Inline) {
                    self.accept_it();
                }
                self.parse_var_type(true)?
            }
        };

        let (ident, area) = match ident_tkn {
            Some(tkn) => (tkn.spell.clone(), tkn.area()),
            None => {
                let area = self.area();
                (self.parse_ident()?, area)
            }
        };

        trace!("parse_function_decl: '{}'", ident);

        let parameters = self.parse_parameter_list()?;

        let mut decl = FunctionDecl {
            attribs,
            return_type,
            ident,
            parameters,
            semantic: None,
            code_block: None,
            flags: Flags::default(),
            area,
        };

        self.parse_function_decl_semantic(&mut decl)?;
        self.parse_annotation_list()?;

        if self.is(TokenKind::Semicolon) {
            self.accept_it();
        } else {
            self.reports.push_context(decl.signature_to_string());
            let block = self.parse_code_block();
            self.reports.pop_context();
            decl.code_block = Some(block?);
        }

        Ok(Stmt::new(StmtKind::FunctionDecl(decl), area))
    }

    fn parse_code_block(&mut self) -> Result<CodeBlock> {
        self.accept(TokenKind::LBrace)?;
        self.open_scope();
        let mut stmts = Vec::new();
        while !self.is(TokenKind::RBrace) {
            if self.is(TokenKind::EndOfStream) {
                self.close_scope();
                return self.error("missing closing brace '}' for open code block");
            }
            let stmt = self.parse_stmt_with_comment(Self::parse_stmt)?;
            stmts.push(stmt);
        }
        self.close_scope();
        self.accept(TokenKind::RBrace)?;
        Ok(CodeBlock { stmts })
    }

    fn parse_parameter_list(&mut self) -> Result<Vec<VarDeclStmt>> {
        self.accept(TokenKind::LParen)?;
        let mut parameters = Vec::new();
        if !self.is(TokenKind::RParen) {
            loop {
                parameters.push(self.parse_parameter()?);
                if self.is(TokenKind::Comma) {
                    self.accept_it();
                } else {
                    break;
                }
            }
        }
        self.accept(TokenKind::RParen)?;
        Ok(parameters)
    }

    fn parse_parameter(&mut self) -> Result<VarDeclStmt> {
        let area = self.area();
        let mut input_modifier = None;
        let mut type_modifiers = Vec::new();
        let mut storage_classes = Vec::new();

        while matches!(
            self.kind(),
            TokenKind::InputModifier | TokenKind::TypeModifier | TokenKind::StorageClass
        ) {
            match self.kind() {
                TokenKind::InputModifier => input_modifier = Some(self.accept_it().spell),
                TokenKind::TypeModifier => type_modifiers.push(self.accept_it().spell),
                TokenKind::StorageClass => storage_classes.push(self.parse_storage_class()?),
                _ => unreachable!(),
            }
        }

        let var_type = self.parse_var_type(false)?;
        let var_decl = self.parse_var_decl(None)?;

        Ok(VarDeclStmt {
            input_modifier,
            storage_classes,
            type_modifiers,
            var_type,
            var_decls: vec![var_decl],
            area,
        })
    }

    fn parse_var_type(&mut self, allow_void: bool) -> Result<VarType> {
        let area = self.area();
        let mut struct_decl = None;
        let type_denoter = self.parse_type_denoter_with_struct_decl_opt(&mut struct_decl, allow_void)?;
        Ok(VarType {
            struct_decl,
            type_denoter,
            area,
        })
    }

    fn parse_var_decl(&mut self, ident_tkn: Option<Token>) -> Result<VarDecl> {
        let (ident, area) = match ident_tkn {
            Some(tkn) => (tkn.spell.clone(), tkn.area()),
            None => {
                let area = self.area();
                (self.parse_ident()?, area)
            }
        };

        let mut decl = VarDecl {
            ident,
            array_dims: self.parse_array_dimension_list(true)?,
            semantic: None,
            pack_offset: None,
            initializer: None,
            flags: Flags::default(),
            area,
        };

        self.parse_var_decl_semantic(&mut decl)?;
        self.parse_annotation_list()?;

        if self.is_spell(TokenKind::AssignOp, "=") {
            self.accept_it();
            decl.initializer = Some(self.parse_expr(false, None)?);
        }

        Ok(decl)
    }

    fn parse_var_decl_list(&mut self, first_ident: Option<Token>) -> Result<Vec<VarDecl>> {
        let mut decls = Vec::new();
        let mut ident = first_ident;
        loop {
            decls.push(self.parse_var_decl(ident.take())?);
            if self.is(TokenKind::Comma) {
                self.accept_it();
            } else {
                break;
            }
        }
        Ok(decls)
    }

    fn parse_var_decl_stmt(&mut self) -> Result<Stmt> {
        let area = self.area();
        let mut storage_classes = Vec::new();
        let mut type_modifiers = Vec::new();
        let var_type;

        loop {
            match self.kind() {
                TokenKind::StorageClass => storage_classes.push(self.parse_storage_class()?),
                TokenKind::TypeModifier => type_modifiers.push(self.accept_it().spell),
                TokenKind::Struct => {
                    let struct_decl = self.parse_struct_decl(true, None)?;
                    let type_denoter = TypeDenoter::Struct(struct_decl.ident.clone());
                    var_type = VarType {
                        struct_decl: Some(struct_decl),
                        type_denoter,
                        area,
                    };
                    break;
                }
                TokenKind::Ident => {
                    var_type = VarType {
                        struct_decl: None,
                        type_denoter: self.parse_type_denoter(false)?,
                        area,
                    };
                    break;
                }
                _ if self.is_data_type() => {
                    var_type = VarType {
                        struct_decl: None,
                        type_denoter: self.parse_type_denoter(false)?,
                        area,
                    };
                    break;
                }
                _ => return self.error_unexpected("variable declaration"),
            }
        }

        let var_decls = self.parse_var_decl_list(None)?;
        self.semi()?;

        Ok(Stmt::new(
            StmtKind::VarDecl(VarDeclStmt {
                input_modifier: None,
                storage_classes,
                type_modifiers,
                var_type,
                var_decls,
                area,
            }),
            area,
        ))
    }

    fn parse_var_decl_stmt_list(&mut self) -> Result<Vec<VarDeclStmt>> {
        self.accept(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.is(TokenKind::RBrace) {
            if self.is(TokenKind::EndOfStream) {
                return self.error("missing closing brace '}' for open code block");
            }
            match self.parse_var_decl_stmt()? {
                Stmt {
                    kind: StmtKind::VarDecl(decl),
                    ..
                } => members.push(decl),
                _ => return Err(CompilerError::Internal(
                    "variable declaration statement expected".to_string(),
                )),
            }
        }
        self.accept_it();
        Ok(members)
    }

    fn parse_struct_decl(
        &mut self,
        parse_struct_tkn: bool,
        ident_tkn: Option<Token>,
    ) -> Result<StructDecl> {
        let area = self.area();
        if parse_struct_tkn {
            self.accept(TokenKind::Struct)?;
        }

        let mut decl = StructDecl {
            ident: String::new(),
            base_struct_name: None,
            members: Vec::new(),
            flags: Flags::default(),
            area,
        };

        if self.struct_nesting > 0 {
            decl.flags.set(Flags::IS_NESTED_STRUCT);
        }

        if self.is(TokenKind::Ident) || ident_tkn.is_some() {
            decl.ident = match ident_tkn {
                Some(tkn) => tkn.spell,
                None => self.parse_ident()?,
            };
            self.register_type_name(&decl.ident);

            // Optional single inheritance.
            if self.is(TokenKind::Colon) {
                self.accept_it();
                let base = self.parse_ident()?;
                if base == decl.ident {
                    return self.error("recursive inheritance is not allowed");
                }
                decl.base_struct_name = Some(base);
                if self.is(TokenKind::Comma) {
                    return self.error("multiple inheritance is not allowed");
                }
            }
        } else {
            decl.flags.set(Flags::IS_ANONYMOUS);
        }

        self.reports.push_context(decl.signature_to_string());
        self.struct_nesting += 1;
        let members = self.parse_var_decl_stmt_list();
        self.struct_nesting -= 1;
        self.reports.pop_context();
        decl.members = members?;

        Ok(decl)
    }

    fn parse_alias_decl_stmt(&mut self) -> Result<Stmt> {
        let area = self.area();
        self.accept(TokenKind::Typedef)?;

        let mut struct_decl = None;
        let type_denoter = self.parse_type_denoter_with_struct_decl_opt(&mut struct_decl, false)?;

        let mut alias_decls = Vec::new();
        loop {
            alias_decls.push(self.parse_alias_decl(type_denoter.clone())?);
            if self.is(TokenKind::Comma) {
                self.accept_it();
            } else {
                break;
            }
        }
        self.semi()?;

        Ok(Stmt::new(
            StmtKind::AliasDecl(AliasDeclStmt {
                struct_decl,
                alias_decls,
            }),
            area,
        ))
    }

    fn parse_alias_decl(&mut self, mut type_denoter: TypeDenoter) -> Result<AliasDecl> {
        let area = self.area();
        let ident = self.parse_ident()?;
        self.register_type_name(&ident);

        if self.is(TokenKind::LBracket) {
            let dims = self.parse_array_dimension_list(false)?;
            type_denoter = TypeDenoter::Array(Box::new(type_denoter), self.evaluate_array_dims(&dims));
        }

        Ok(AliasDecl {
            ident,
            type_denoter,
            area,
        })
    }

    fn parse_buffer_decl_stmt(&mut self) -> Result<Stmt> {
        let area = self.area();
        let type_tkn = self.accept(TokenKind::UniformBuffer)?;
        let buffer_type = UniformBufferType::from_keyword(&type_tkn.spell).ok_or_else(|| {
            CompilerError::Syntax(
                format!("unknown uniform buffer type '{}'", type_tkn.spell),
                Some(type_tkn.area()),
            )
        })?;
        let ident = self.parse_ident()?;
        let slot_registers = self.parse_register_list(true)?;

        self.reports.push_context(format!("uniform buffer '{}'", ident));
        self.inside_uniform_buffer = true;
        let members = self.parse_var_decl_stmt_list();
        self.inside_uniform_buffer = false;

        // Trailing semicolon is optional for cbuffer and tbuffer.
        if self.is(TokenKind::Semicolon) {
            self.accept_it();
        }
        self.reports.pop_context();

        Ok(Stmt::new(
            StmtKind::BufferDecl(BufferDeclStmt {
                buffer_type,
                ident,
                slot_registers,
                members: members?,
                area,
            }),
            area,
        ))
    }

    fn parse_texture_decl_stmt(&mut self) -> Result<Stmt> {
        let area = self.area();
        let type_tkn = self.accept_it();
        let texture_type = BufferType::from_keyword(&type_tkn.spell).ok_or_else(|| {
            CompilerError::Syntax(
                format!("unknown texture or buffer type '{}'", type_tkn.spell),
                Some(type_tkn.area()),
            )
        })?;

        let mut stmt = TextureDeclStmt {
            texture_type,
            color_type: None,
            num_samples: None,
            texture_decls: Vec::new(),
            area,
        };

        // Optional template arguments: '<' colorType (',' samples)? '>'.
        if self.is_spell(TokenKind::BinaryOp, "<") {
            self.push_parsing_state(ParsingState {
                active_template: true,
            });
            self.accept_it();

            if matches!(self.kind(), TokenKind::ScalarType | TokenKind::VectorType) {
                stmt.color_type = self.parse_data_type_keyword()?;
            } else {
                self.pop_parsing_state();
                return self.error_unexpected("scalar or vector type denoter");
            }

            if self.is(TokenKind::Comma) {
                self.accept_it();
                let num_samples = self.parse_and_evaluate_const_expr_int()?;
                if !(1..128).contains(&num_samples) {
                    self.warning(
                        &format!(
                            "number of samples in texture must be in the range [1, 128), but got {}",
                            num_samples
                        ),
                        type_tkn.area(),
                    );
                }
                stmt.num_samples = Some(num_samples);
            }

            let result = self.accept_spell(TokenKind::BinaryOp, ">");
            self.pop_parsing_state();
            result?;
        }

        loop {
            stmt.texture_decls.push(self.parse_texture_decl()?);
            if self.is(TokenKind::Comma) {
                self.accept_it();
            } else {
                break;
            }
        }
        self.semi()?;

        Ok(Stmt::new(StmtKind::TextureDecl(stmt), area))
    }

    fn parse_texture_decl(&mut self) -> Result<TextureDecl> {
        let area = self.area();
        Ok(TextureDecl {
            ident: self.parse_ident()?,
            array_dims: self.parse_array_dimension_list(false)?,
            slot_registers: self.parse_register_list(true)?,
            flags: Flags::default(),
            area,
        })
    }

    fn parse_sampler_decl_stmt(&mut self) -> Result<Stmt> {
        let area = self.area();
        let sampler_type = self.accept_it().spell;

        let mut decls = Vec::new();
        loop {
            decls.push(self.parse_sampler_decl()?);
            if self.is(TokenKind::Comma) {
                self.accept_it();
            } else {
                break;
            }
        }
        self.semi()?;

        Ok(Stmt::new(
            StmtKind::SamplerDecl(SamplerDeclStmt {
                sampler_type,
                sampler_decls: decls,
                area,
            }),
            area,
        ))
    }

    fn parse_sampler_decl(&mut self) -> Result<SamplerDecl> {
        let area = self.area();
        let mut decl = SamplerDecl {
            ident: self.parse_ident()?,
            array_dims: self.parse_array_dimension_list(false)?,
            slot_registers: self.parse_register_list(true)?,
            texture_ident: None,
            sampler_values: Vec::new(),
            area,
        };

        if self.is_spell(TokenKind::AssignOp, "=") {
            // D3D9-style state block.
            self.accept_it();
            self.accept_spell(TokenKind::SamplerState, "sampler_state")?;
            self.accept(TokenKind::LBrace)?;
            if self.is_spell(TokenKind::Texture, "texture") {
                decl.texture_ident = Some(self.parse_sampler_state_texture_ident()?);
            }
            decl.sampler_values = self.parse_sampler_value_list()?;
            self.accept(TokenKind::RBrace)?;
        } else if self.is(TokenKind::LBrace) {
            // D3D10+ state body.
            self.accept_it();
            decl.sampler_values = self.parse_sampler_value_list()?;
            self.accept(TokenKind::RBrace)?;
        }

        Ok(decl)
    }

    fn parse_sampler_state_texture_ident(&mut self) -> Result<String> {
        self.accept_spell(TokenKind::Texture, "texture")?;
        self.accept_spell(TokenKind::AssignOp, "=")?;

        let ident;
        if self.is(TokenKind::LParen) {
            self.accept_it();
            ident = self.parse_ident()?;
            self.accept(TokenKind::RParen)?;
        } else if self.is_spell(TokenKind::BinaryOp, "<") {
            self.accept_it();
            ident = self.parse_ident()?;
            self.accept_spell(TokenKind::BinaryOp, ">")?;
        } else {
            return self.error_unexpected("'<' or '('");
        }
        self.semi()?;

        Ok(ident)
    }

    fn parse_sampler_value_list(&mut self) -> Result<Vec<SamplerValue>> {
        let mut values = Vec::new();
        while !self.is(TokenKind::RBrace) {
            if self.is(TokenKind::EndOfStream) {
                return self.error("missing closing brace '}' for sampler state block");
            }
            let area = self.area();
            let name = self.parse_ident()?;
            self.accept_spell(TokenKind::AssignOp, "=")?;
            let value = self.parse_expr(false, None)?;
            self.semi()?;
            values.push(SamplerValue { name, value, area });
        }
        Ok(values)
    }

    /* ----- Registers, pack offsets, semantics ----- */

    // ':' 'register' '(' (IDENT ',')? IDENT ('[' INT ']')? ')'
    fn parse_register(&mut self, parse_colon: bool) -> Result<Register> {
        if parse_colon {
            self.accept(TokenKind::Colon)?;
        }

        let area = self.area();
        self.accept(TokenKind::Register)?;
        self.accept(TokenKind::LParen)?;

        let mut type_ident = self.parse_ident()?;
        let mut shader_target = None;

        // Optional leading shader profile (e.g. "vs_5_0" or "ps").
        if self.is(TokenKind::Comma) {
            shader_target = shader_profile_to_target(&type_ident);
            if shader_target.is_none() {
                self.warning(&format!("unknown shader profile: '{}'", type_ident), area);
            }
            self.accept_it();
            type_ident = self.parse_ident()?;
        }

        let register_type = type_ident
            .chars()
            .next()
            .map(RegisterType::from_char)
            .unwrap_or(RegisterType::Undefined);
        let mut slot: i32 = type_ident[1..].parse().unwrap_or(0);

        if register_type == RegisterType::Undefined {
            self.warning(
                &format!("unknown slot register: '{}'", &type_ident[..1]),
                area,
            );
        }

        // Optional sub component, folded into the slot index.
        if self.is(TokenKind::LBracket) {
            self.accept_it();
            let sub = self.accept(TokenKind::IntLiteral)?;
            slot += sub.spell.parse::<i32>().unwrap_or(0);
            self.accept(TokenKind::RBracket)?;
        }

        self.accept(TokenKind::RParen)?;

        Ok(Register {
            shader_target,
            register_type,
            slot,
            area,
        })
    }

    fn parse_register_list(&mut self, parse_first_colon: bool) -> Result<Vec<Register>> {
        let mut registers = Vec::new();
        if parse_first_colon {
            while self.is(TokenKind::Colon) {
                // Peek past the colon: semantics also start with ':'.
                if self.tokens.get(self.current + 1).map(|t| t.kind) != Some(TokenKind::Register) {
                    break;
                }
                registers.push(self.parse_register(true)?);
            }
        } else {
            while self.is(TokenKind::Register) {
                registers.push(self.parse_register(false)?);
            }
        }
        Ok(registers)
    }

    // ':' 'packoffset' '(' IDENT ('.' COMPONENT)? ')'
    fn parse_pack_offset(&mut self, parse_colon: bool) -> Result<PackOffset> {
        if parse_colon {
            self.accept(TokenKind::Colon)?;
        }

        let area = self.area();
        self.accept(TokenKind::PackOffset)?;
        self.accept(TokenKind::LParen)?;

        let register_name = self.parse_ident()?;
        let mut vector_component = None;
        if self.is(TokenKind::Dot) {
            self.accept_it();
            vector_component = Some(self.parse_ident()?);
        }

        self.accept(TokenKind::RParen)?;

        Ok(PackOffset {
            register_name,
            vector_component,
            area,
        })
    }

    fn parse_var_decl_semantic(&mut self, decl: &mut VarDecl) -> Result<()> {
        while self.is(TokenKind::Colon) {
            self.accept(TokenKind::Colon)?;

            if self.is(TokenKind::Register) {
                let area = self.area();
                self.warning("register is ignored for variable declarations", area);
                self.parse_register(false)?;
            } else if self.is(TokenKind::PackOffset) {
                let pack_offset = self.parse_pack_offset(false)?;
                if !self.inside_uniform_buffer {
                    return Err(CompilerError::Syntax(
                        "packoffset is only allowed in a constant buffer".to_string(),
                        Some(pack_offset.area),
                    ));
                }
                if let Some(previous) = decl.pack_offset.replace(pack_offset) {
                    self.warning("previous packoffset is discarded", previous.area);
                }
            } else {
                decl.semantic = Some(self.parse_semantic()?);
            }
        }
        Ok(())
    }

    fn parse_function_decl_semantic(&mut self, decl: &mut FunctionDecl) -> Result<()> {
        while self.is(TokenKind::Colon) {
            self.accept(TokenKind::Colon)?;

            if self.is(TokenKind::Register) {
                let area = self.area();
                self.warning("register is ignored for function declarations", area);
                self.parse_register(false)?;
            } else if self.is(TokenKind::PackOffset) {
                let pack_offset = self.parse_pack_offset(false)?;
                return Err(CompilerError::Syntax(
                    "packoffset is only allowed in a constant buffer".to_string(),
                    Some(pack_offset.area),
                ));
            } else {
                decl.semantic = Some(self.parse_semantic()?);
            }
        }
        Ok(())
    }

    fn parse_semantic(&mut self) -> Result<IndexedSemantic> {
        let ident = self.parse_ident()?;
        Ok(IndexedSemantic::parse(&ident))
    }

    fn parse_annotation_list(&mut self) -> Result<()> {
        // Annotations are parsed and discarded.
        if self.is_spell(TokenKind::BinaryOp, "<") {
            self.accept_it();
            while !self.is_spell(TokenKind::BinaryOp, ">") {
                if self.is(TokenKind::EndOfStream) {
                    return self.error("missing '>' for open annotation list");
                }
                self.parse_var_decl_stmt()?;
            }
            self.accept_it();
        }
        Ok(())
    }

    /* ----- Statements ----- */

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let mut attribs = Vec::new();
        if self.is(TokenKind::LBracket) {
            attribs = self.parse_attribute_list()?;
        }

        match self.kind() {
            TokenKind::Semicolon => {
                let area = self.area();
                self.semi()?;
                Ok(Stmt::new(StmtKind::Null, area))
            }
            TokenKind::LBrace => {
                let area = self.area();
                let block = self.parse_code_block()?;
                Ok(Stmt::new(StmtKind::CodeBlock(block), area))
            }
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::Ident => self.parse_var_decl_or_assign_or_function_call_stmt(),
            TokenKind::For => self.parse_for_stmt(attribs),
            TokenKind::While => self.parse_while_stmt(attribs),
            TokenKind::Do => self.parse_do_while_stmt(attribs),
            TokenKind::If => self.parse_if_stmt(attribs),
            TokenKind::Switch => self.parse_switch_stmt(attribs),
            TokenKind::CtrlTransfer => self.parse_ctrl_transfer_stmt(),
            TokenKind::Struct => self.parse_struct_decl_or_var_decl_stmt(),
            TokenKind::Typedef => self.parse_alias_decl_stmt(),
            TokenKind::Sampler | TokenKind::SamplerState => self.parse_sampler_decl_stmt(),
            TokenKind::TypeModifier | TokenKind::StorageClass => self.parse_var_decl_stmt(),
            _ if self.is_data_type() => self.parse_var_decl_stmt(),
            _ => self.parse_expr_stmt(None),
        }
    }

    fn parse_return_stmt(&mut self) -> Result<Stmt> {
        let area = self.area();
        self.accept(TokenKind::Return)?;
        let expr = if self.is(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr(true, None)?)
        };
        self.semi()?;
        Ok(Stmt::new(StmtKind::Return(expr), area))
    }

    fn parse_ctrl_transfer_stmt(&mut self) -> Result<Stmt> {
        let area = self.area();
        let tkn = self.accept(TokenKind::CtrlTransfer)?;
        let transfer = CtrlTransfer::from_spell(&tkn.spell).ok_or_else(|| {
            CompilerError::Internal(format!("unknown control transfer '{}'", tkn.spell))
        })?;
        self.semi()?;
        Ok(Stmt::new(StmtKind::CtrlTransfer(transfer), area))
    }

    fn parse_for_stmt(&mut self, attribs: Vec<Attribute>) -> Result<Stmt> {
        let area = self.area();
        self.accept(TokenKind::For)?;
        self.accept(TokenKind::LParen)?;

        let init = Box::new(self.parse_stmt()?);

        let condition = if self.is(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr(true, None)?)
        };
        self.semi()?;

        let iteration = if self.is(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr(true, None)?)
        };
        self.accept(TokenKind::RParen)?;

        let body = Box::new(self.parse_stmt()?);
        self.warn_on_null_stmt(&body, "for loop");

        Ok(Stmt::new(
            StmtKind::For {
                attribs,
                init,
                condition,
                iteration,
                body,
            },
            area,
        ))
    }

    fn parse_while_stmt(&mut self, attribs: Vec<Attribute>) -> Result<Stmt> {
        let area = self.area();
        self.accept(TokenKind::While)?;
        self.accept(TokenKind::LParen)?;
        let condition = self.parse_expr(true, None)?;
        self.accept(TokenKind::RParen)?;
        let body = Box::new(self.parse_stmt()?);
        self.warn_on_null_stmt(&body, "while loop");
        Ok(Stmt::new(
            StmtKind::While {
                attribs,
                condition,
                body,
            },
            area,
        ))
    }

    fn parse_do_while_stmt(&mut self, attribs: Vec<Attribute>) -> Result<Stmt> {
        let area = self.area();
        self.accept(TokenKind::Do)?;
        let body = Box::new(self.parse_stmt()?);
        self.warn_on_null_stmt(&body, "do-while loop");
        self.accept(TokenKind::While)?;
        self.accept(TokenKind::LParen)?;
        let condition = self.parse_expr(true, None)?;
        self.accept(TokenKind::RParen)?;
        self.semi()?;
        Ok(Stmt::new(
            StmtKind::DoWhile {
                attribs,
                body,
                condition,
            },
            area,
        ))
    }

    fn parse_if_stmt(&mut self, attribs: Vec<Attribute>) -> Result<Stmt> {
        let area = self.area();
        self.accept(TokenKind::If)?;
        self.accept(TokenKind::LParen)?;
        let condition = self.parse_expr(true, None)?;
        self.accept(TokenKind::RParen)?;
        let body = Box::new(self.parse_stmt()?);
        self.warn_on_null_stmt(&body, "if");

        let else_stmt = if self.is(TokenKind::Else) {
            let else_area = self.area();
            self.accept_it();
            let else_body = Box::new(self.parse_stmt()?);
            self.warn_on_null_stmt(&else_body, "else");
            Some(ElseStmt {
                body: else_body,
                area: else_area,
            })
        } else {
            None
        };

        Ok(Stmt::new(
            StmtKind::If {
                attribs,
                condition,
                body,
                else_stmt,
            },
            area,
        ))
    }

    fn parse_switch_stmt(&mut self, attribs: Vec<Attribute>) -> Result<Stmt> {
        let area = self.area();
        self.accept(TokenKind::Switch)?;
        self.accept(TokenKind::LParen)?;
        let selector = self.parse_expr(true, None)?;
        self.accept(TokenKind::RParen)?;

        self.accept(TokenKind::LBrace)?;
        let mut cases = Vec::new();
        while self.is(TokenKind::Case) || self.is(TokenKind::Default) {
            cases.push(self.parse_switch_case()?);
        }
        self.accept(TokenKind::RBrace)?;

        Ok(Stmt::new(
            StmtKind::Switch {
                attribs,
                selector,
                cases,
            },
            area,
        ))
    }

    fn parse_switch_case(&mut self) -> Result<SwitchCase> {
        let expr = if self.is(TokenKind::Case) {
            self.accept_it();
            Some(self.parse_expr(false, None)?)
        } else {
            self.accept(TokenKind::Default)?;
            None
        };
        self.accept(TokenKind::Colon)?;

        // Case body runs until the next label or the closing brace.
        let mut stmts = Vec::new();
        while !matches!(
            self.kind(),
            TokenKind::Case | TokenKind::Default | TokenKind::RBrace
        ) {
            if self.is(TokenKind::EndOfStream) {
                return self.error("missing closing brace '}' for switch statement");
            }
            let stmt = self.parse_stmt_with_comment(Self::parse_stmt)?;
            stmts.push(stmt);
        }

        Ok(SwitchCase { expr, stmts })
    }

    fn parse_expr_stmt(&mut self, var_ident: Option<VarIdent>) -> Result<Stmt> {
        let area = self.area();
        let expr = match var_ident {
            Some(var_ident) => {
                let init = Expr::new(
                    ExprKind::VarAccess(VarAccessExpr {
                        var_ident,
                        assign_op: None,
                        assign_expr: None,
                    }),
                    area,
                );
                self.parse_expr(true, Some(init))?
            }
            None => self.parse_expr(true, None)?,
        };
        self.semi()?;
        Ok(Stmt::new(StmtKind::Expr(expr), area))
    }

    fn parse_struct_decl_or_var_decl_stmt(&mut self) -> Result<Stmt> {
        let area = self.area();
        let struct_decl = self.parse_struct_decl(true, None)?;

        if self.is(TokenKind::Semicolon) {
            self.semi()?;
            return Ok(Stmt::new(
                StmtKind::StructDecl(StructDeclStmt { struct_decl }),
                area,
            ));
        }

        // Variable declaration with the freshly declared structure type.
        let type_denoter = TypeDenoter::Struct(struct_decl.ident.clone());
        let var_type = VarType {
            struct_decl: Some(struct_decl),
            type_denoter,
            area,
        };
        let var_decls = self.parse_var_decl_list(None)?;
        self.semi()?;

        Ok(Stmt::new(
            StmtKind::VarDecl(VarDeclStmt {
                input_modifier: None,
                storage_classes: Vec::new(),
                type_modifiers: Vec::new(),
                var_type,
                var_decls,
                area,
            }),
            area,
        ))
    }

    /// A statement starting with an identifier is a function call,
    /// an assignment, a post-unary expression, or a variable declaration
    /// whose type is the parsed identifier.
    fn parse_var_decl_or_assign_or_function_call_stmt(&mut self) -> Result<Stmt> {
        let area = self.area();
        let var_ident = self.parse_var_ident()?;

        if self.is(TokenKind::LParen) {
            let call = self.parse_function_call_expr(Some(var_ident), None)?;
            let expr = self.parse_expr(true, Some(call))?;
            self.semi()?;
            return Ok(Stmt::new(StmtKind::Expr(expr), area));
        }

        if self.is(TokenKind::AssignOp) {
            let assign_op = AssignOp::from_spell(&self.accept_it().spell)
                .ok_or_else(|| CompilerError::Internal("unknown assign operator".to_string()))?;
            let assign_expr = Box::new(self.parse_expr(true, None)?);
            self.semi()?;
            let expr = Expr::new(
                ExprKind::VarAccess(VarAccessExpr {
                    var_ident,
                    assign_op: Some(assign_op),
                    assign_expr: Some(assign_expr),
                }),
                area,
            );
            return Ok(Stmt::new(StmtKind::Expr(expr), area));
        }

        if self.is_spell(TokenKind::UnaryOp, "++") || self.is_spell(TokenKind::UnaryOp, "--") {
            return self.parse_expr_stmt(Some(var_ident));
        }

        if var_ident.next.is_none() {
            // The identifier was a type name after all: variable declaration.
            let mut type_denoter = TypeDenoter::Alias(var_ident.ident.clone());
            if !var_ident.array_indices.is_empty() {
                let dims = self.evaluate_array_dims(&var_ident.array_indices);
                type_denoter = TypeDenoter::Array(Box::new(type_denoter), dims);
            }

            let var_type = VarType {
                struct_decl: None,
                type_denoter,
                area: var_ident.area,
            };
            let var_decls = self.parse_var_decl_list(None)?;
            self.semi()?;

            return Ok(Stmt::new(
                StmtKind::VarDecl(VarDeclStmt {
                    input_modifier: None,
                    storage_classes: Vec::new(),
                    type_modifiers: Vec::new(),
                    var_type,
                    var_decls,
                    area,
                }),
                area,
            ));
        }

        self.error_unexpected("variable declaration, assignment or function call statement")
    }

    /* ----- Expressions ----- */

    fn parse_expr(&mut self, allow_comma: bool, init_expr: Option<Expr>) -> Result<Expr> {
        let mut expr = match init_expr {
            Some(expr) => {
                let expr = self.parse_binary_expr_with(expr)?;
                self.parse_ternary_expr_with(expr)?
            }
            None => self.parse_generic_expr()?,
        };

        // Optional post-unary expression ('x++', 'x--').
        if self.is_spell(TokenKind::UnaryOp, "++") || self.is_spell(TokenKind::UnaryOp, "--") {
            let op = UnaryOp::from_spell(&self.accept_it().spell)
                .expect("token spelling is a unary operator");
            let area = expr.area;
            expr = Expr::new(
                ExprKind::PostUnary {
                    op,
                    expr: Box::new(expr),
                },
                area,
            );
        }

        // Optional list expression.
        if allow_comma && self.is(TokenKind::Comma) {
            self.accept_it();
            let area = expr.area;
            let next = self.parse_expr(true, None)?;
            return Ok(Expr::new(
                ExprKind::List(Box::new(expr), Box::new(next)),
                area,
            ));
        }

        Ok(expr)
    }

    fn parse_generic_expr(&mut self) -> Result<Expr> {
        let lhs = self.parse_primary_expr()?;
        let expr = self.parse_binary_expr_with(lhs)?;
        self.parse_ternary_expr_with(expr)
    }

    fn parse_ternary_expr_with(&mut self, condition: Expr) -> Result<Expr> {
        if !self.is(TokenKind::TernaryOp) {
            return Ok(condition);
        }
        self.accept_it();
        let area = condition.area;
        let then_expr = self.parse_generic_expr()?;
        self.accept(TokenKind::Colon)?;
        let else_expr = self.parse_generic_expr()?;
        Ok(Expr::new(
            ExprKind::Ternary {
                condition: Box::new(condition),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            area,
        ))
    }

    fn binary_op_precedence(&self, spell: &str) -> Option<u8> {
        if self.active_template() && (spell == "<" || spell == ">") {
            // Inside a template argument list these close the template.
            return None;
        }
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

    fn parse_binary_expr_with(&mut self, lhs: Expr) -> Result<Expr> {
        self.parse_binary_expr_climb(lhs, 1)
    }

    fn parse_binary_expr_climb(&mut self, mut lhs: Expr, min_prec: u8) -> Result<Expr> {
        while self.is(TokenKind::BinaryOp) {
            let spell = self.tkn().spell.clone();
            let prec = match self.binary_op_precedence(&spell) {
                Some(prec) if prec >= min_prec => prec,
                _ => break,
            };
            self.accept_it();
            let op = BinaryOp::from_spell(&spell)
                .ok_or_else(|| CompilerError::Internal(format!("unknown binary operator '{}'", spell)))?;

            let mut rhs = self.parse_primary_expr()?;
            while self.is(TokenKind::BinaryOp) {
                match self.binary_op_precedence(&self.tkn().spell) {
                    Some(next_prec) if next_prec > prec => {
                        rhs = self.parse_binary_expr_climb(rhs, next_prec)?;
                    }
                    _ => break,
                }
            }

            let area = lhs.area;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                area,
            );
        }
        Ok(lhs)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        if self.is_literal() {
            return self.parse_literal_or_suffix_expr();
        }
        if self.is_data_type() || self.is(TokenKind::Struct) {
            return self.parse_type_name_or_function_call_expr();
        }
        if self.is(TokenKind::UnaryOp) || self.is_arithmetic_unary() {
            return self.parse_unary_expr();
        }
        if self.is(TokenKind::LParen) {
            return self.parse_bracket_or_cast_expr();
        }
        if self.is(TokenKind::LBrace) {
            return self.parse_initializer_expr();
        }
        if self.is(TokenKind::Ident) {
            return self.parse_var_access_or_function_call_expr();
        }
        self.error_unexpected("primary expression")
    }

    fn parse_literal_or_suffix_expr(&mut self) -> Result<Expr> {
        let area = self.area();
        let token = self.accept_it();
        let data_type = match token.kind {
            TokenKind::BoolLiteral => DataType::from_keyword("bool").unwrap(),
            TokenKind::IntLiteral => DataType::from_keyword("int").unwrap(),
            TokenKind::FloatLiteral => DataType::from_keyword("float").unwrap(),
            TokenKind::StringLiteral => DataType::String,
            _ => return Err(CompilerError::Internal("literal token expected".to_string())),
        };
        let mut expr = Expr::new(
            ExprKind::Literal(LiteralExpr {
                data_type,
                value: token.spell,
            }),
            area,
        );

        if self.is(TokenKind::Dot) {
            expr = self.parse_suffix_expr(expr)?;
        }
        Ok(expr)
    }

    fn parse_type_name_or_function_call_expr(&mut self) -> Result<Expr> {
        let area = self.area();
        let type_denoter = self.parse_type_denoter(false)?;

        if self.is(TokenKind::LParen) {
            // Type constructor call, e.g. 'float4(pos, 1.0)'.
            return self.parse_function_call_expr(None, Some(type_denoter));
        }

        Ok(Expr::new(ExprKind::TypeName(type_denoter), area))
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        let area = self.area();
        let token = self.accept_it();
        let op = UnaryOp::from_spell(&token.spell).ok_or_else(|| {
            CompilerError::Syntax(
                format!("expected unary operator, got '{}'", token.spell),
                Some(token.area()),
            )
        })?;
        let expr = self.parse_primary_expr()?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
            area,
        ))
    }

    /// Parses `( ... )` and decides between a bracket expression and a cast
    /// by consulting the type-name table.
    fn parse_bracket_or_cast_expr(&mut self) -> Result<Expr> {
        let area = self.area();
        self.accept(TokenKind::LParen)?;

        // Inside brackets '<' and '>' are ordinary binary operators, even
        // while a template argument list is active.
        let inner = if self.active_template() {
            self.push_parsing_state(ParsingState {
                active_template: false,
            });
            let inner = self.parse_expr(true, None);
            self.pop_parsing_state();
            inner?
        } else {
            self.parse_expr(true, None)?
        };

        self.accept(TokenKind::RParen)?;

        if let Some(type_denoter) = self.to_type_denoter_if_cast_lhs(&inner) {
            let operand = self.parse_primary_expr()?;
            return Ok(Expr::new(
                ExprKind::Cast {
                    type_denoter,
                    expr: Box::new(operand),
                },
                area,
            ));
        }

        let mut expr = Expr::new(ExprKind::Bracket(Box::new(inner)), area);

        if self.is(TokenKind::LBracket) {
            expr = self.parse_array_access_expr(expr)?;
        }
        if self.is(TokenKind::Dot) {
            expr = self.parse_suffix_expr(expr)?;
        }

        Ok(expr)
    }

    /// A bracketed expression is the left-hand side of a cast if it is a
    /// type name, or a bare variable access whose identifier names a type.
    fn to_type_denoter_if_cast_lhs(&self, expr: &Expr) -> Option<TypeDenoter> {
        match &expr.kind {
            ExprKind::TypeName(type_denoter) => Some(type_denoter.clone()),
            ExprKind::VarAccess(access)
                if access.var_ident.next.is_none()
                    && access.var_ident.array_indices.is_empty()
                    && access.assign_op.is_none()
                    && self.is_registered_type_name(&access.var_ident.ident) =>
            {
                Some(TypeDenoter::Alias(access.var_ident.ident.clone()))
            }
            _ => None,
        }
    }

    fn parse_var_access_or_function_call_expr(&mut self) -> Result<Expr> {
        let var_ident = self.parse_var_ident()?;
        if self.is(TokenKind::LParen) {
            return self.parse_function_call_expr(Some(var_ident), None);
        }
        self.parse_var_access_expr(var_ident)
    }

    fn parse_var_access_expr(&mut self, var_ident: VarIdent) -> Result<Expr> {
        let area = var_ident.area;
        let mut access = VarAccessExpr {
            var_ident,
            assign_op: None,
            assign_expr: None,
        };

        if self.is(TokenKind::AssignOp) {
            access.assign_op = AssignOp::from_spell(&self.accept_it().spell);
            access.assign_expr = Some(Box::new(self.parse_expr(false, None)?));
        }

        Ok(Expr::new(ExprKind::VarAccess(access), area))
    }

    fn parse_function_call_expr(
        &mut self,
        var_ident: Option<VarIdent>,
        type_denoter: Option<TypeDenoter>,
    ) -> Result<Expr> {
        let area = var_ident
            .as_ref()
            .map(|v| v.area)
            .unwrap_or_else(|| self.area());

        let arguments = self.parse_argument_list()?;

        let call = FunctionCall {
            var_ident,
            type_denoter,
            arguments,
            intrinsic: None,
            intrinsic_arg_type: None,
            flags: Flags::default(),
            area,
        };
        let mut expr = Expr::new(ExprKind::Call(call), area);

        if self.is(TokenKind::LBracket) {
            expr = self.parse_array_access_expr(expr)?;
        }
        if self.is(TokenKind::Dot) {
            expr = self.parse_suffix_expr(expr)?;
        }

        Ok(expr)
    }

    fn parse_suffix_expr(&mut self, expr: Expr) -> Result<Expr> {
        let area = expr.area;
        self.accept(TokenKind::Dot)?;
        let var_ident = self.parse_var_ident()?;
        Ok(Expr::new(
            ExprKind::Suffix {
                expr: Box::new(expr),
                var_ident,
            },
            area,
        ))
    }

    fn parse_initializer_expr(&mut self) -> Result<Expr> {
        let area = self.area();
        self.accept(TokenKind::LBrace)?;
        let mut exprs = Vec::new();
        if !self.is(TokenKind::RBrace) {
            loop {
                exprs.push(self.parse_expr(false, None)?);
                if self.is(TokenKind::Comma) {
                    self.accept_it();
                    if self.is(TokenKind::RBrace) {
                        break;
                    }
                } else {
                    break;
                }
            }
        }
        self.accept(TokenKind::RBrace)?;
        Ok(Expr::new(ExprKind::Initializer(exprs), area))
    }

    fn parse_array_access_expr(&mut self, expr: Expr) -> Result<Expr> {
        let area = expr.area;
        let indices = self.parse_array_dimension_list(false)?;
        Ok(Expr::new(
            ExprKind::ArrayAccess {
                expr: Box::new(expr),
                indices,
            },
            area,
        ))
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Expr>> {
        self.accept(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.is(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr(false, None)?);
                if self.is(TokenKind::Comma) {
                    self.accept_it();
                } else {
                    break;
                }
            }
        }
        self.accept(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_var_ident(&mut self) -> Result<VarIdent> {
        let area = self.area();
        let ident = self.parse_ident()?;
        let mut var_ident = VarIdent::new(ident, area);
        var_ident.array_indices = self.parse_array_dimension_list(false)?;

        if self.is(TokenKind::Dot) {
            self.accept_it();
            var_ident.next = Some(Box::new(self.parse_var_ident()?));
        }

        Ok(var_ident)
    }

    fn parse_array_dimension_list(&mut self, allow_dynamic: bool) -> Result<Vec<Expr>> {
        let mut dims = Vec::new();
        while self.is(TokenKind::LBracket) {
            dims.push(self.parse_array_dimension(allow_dynamic)?);
        }
        Ok(dims)
    }

    fn parse_array_dimension(&mut self, allow_dynamic: bool) -> Result<Expr> {
        let area = self.area();
        self.accept(TokenKind::LBracket)?;

        let expr = if self.is(TokenKind::RBracket) {
            if !allow_dynamic {
                return self.error("explicit array dimension expected");
            }
            Expr::new(ExprKind::Null, area)
        } else {
            self.parse_expr(false, None)?
        };

        self.accept(TokenKind::RBracket)?;
        Ok(expr)
    }

    fn parse_attribute_list(&mut self) -> Result<Vec<Attribute>> {
        let mut attribs = Vec::new();
        while self.is(TokenKind::LBracket) {
            attribs.push(self.parse_attribute()?);
        }
        Ok(attribs)
    }

    // '[' IDENT ('(' ARGS ')')? ']'
    fn parse_attribute(&mut self) -> Result<Attribute> {
        let area = self.area();
        self.accept(TokenKind::LBracket)?;

        let ident = self.parse_ident()?;
        let mut arguments = Vec::new();

        if self.is(TokenKind::LParen) {
            self.accept_it();
            if !self.is(TokenKind::RParen) {
                loop {
                    arguments.push(self.parse_expr(false, None)?);
                    if self.is(TokenKind::Comma) {
                        self.accept_it();
                    } else {
                        break;
                    }
                }
            }
            self.accept(TokenKind::RParen)?;
        }

        self.accept(TokenKind::RBracket)?;

        Ok(Attribute {
            ident,
            arguments,
            area,
        })
    }

    /* ----- Type denoters ----- */

    fn parse_type_denoter(&mut self, allow_void: bool) -> Result<TypeDenoter> {
        if self.is(TokenKind::Void) {
            if !allow_void {
                return self.error("'void' type not allowed in this context");
            }
            self.accept_it();
            return Ok(TypeDenoter::Void);
        }

        let primary = self.parse_type_denoter_primary()?;

        if self.is(TokenKind::LBracket) {
            let dims = self.parse_array_dimension_list(false)?;
            let dims = self.evaluate_array_dims(&dims);
            return Ok(TypeDenoter::Array(Box::new(primary), dims));
        }

        Ok(primary)
    }

    fn parse_type_denoter_primary(&mut self) -> Result<TypeDenoter> {
        match self.kind() {
            _ if self.is_base_data_type() => {
                let keyword = self.accept_it().spell;
                if keyword == "string" {
                    return Ok(TypeDenoter::Base(DataType::String));
                }
                DataType::from_keyword(&keyword)
                    .map(TypeDenoter::Base)
                    .ok_or_else(|| {
                        CompilerError::Syntax(
                            format!("unknown type denoter '{}'", keyword),
                            Some(self.area()),
                        )
                    })
            }
            TokenKind::Vector => self.parse_generic_vector_type_denoter(),
            TokenKind::Matrix => self.parse_generic_matrix_type_denoter(),
            TokenKind::Ident => {
                let ident = self.parse_ident()?;
                Ok(TypeDenoter::Alias(ident))
            }
            TokenKind::Struct => {
                self.accept_it();
                let ident = self.parse_ident()?;
                Ok(TypeDenoter::Struct(ident))
            }
            TokenKind::Texture | TokenKind::StorageBuffer => {
                let keyword = self.accept_it().spell;
                BufferType::from_keyword(&keyword)
                    .map(TypeDenoter::Texture)
                    .ok_or_else(|| {
                        CompilerError::Syntax(
                            format!("unknown texture type '{}'", keyword),
                            Some(self.area()),
                        )
                    })
            }
            TokenKind::Sampler | TokenKind::SamplerState => {
                self.accept_it();
                Ok(TypeDenoter::Sampler)
            }
            _ => self.error_unexpected("type denoter"),
        }
    }

    // vector '<' ScalarType ',' '1'-'4' '>'
    fn parse_generic_vector_type_denoter(&mut self) -> Result<TypeDenoter> {
        self.accept(TokenKind::Vector)?;

        if !self.is_spell(TokenKind::BinaryOp, "<") {
            // 'vector' defaults to float4.
            return Ok(TypeDenoter::Base(DataType::from_keyword("float4").unwrap()));
        }

        self.accept_it();
        self.push_parsing_state(ParsingState {
            active_template: true,
        });

        let result = (|| {
            let scalar = self.accept(TokenKind::ScalarType)?.spell;
            self.accept(TokenKind::Comma)?;
            let dim = self.parse_and_evaluate_vector_dimension()?;
            let keyword = format!("{}{}", scalar, dim);
            DataType::from_keyword(&keyword)
                .map(TypeDenoter::Base)
                .ok_or_else(|| {
                    CompilerError::Syntax(
                        format!("invalid vector type '{}'", keyword),
                        Some(self.area()),
                    )
                })
        })();

        let close = self.accept_spell(TokenKind::BinaryOp, ">");
        self.pop_parsing_state();
        close?;
        result
    }

    // matrix '<' ScalarType ',' '1'-'4' ',' '1'-'4' '>'
    fn parse_generic_matrix_type_denoter(&mut self) -> Result<TypeDenoter> {
        self.accept(TokenKind::Matrix)?;

        if !self.is_spell(TokenKind::BinaryOp, "<") {
            // 'matrix' defaults to float4x4.
            return Ok(TypeDenoter::Base(DataType::from_keyword("float4x4").unwrap()));
        }

        self.accept_it();
        self.push_parsing_state(ParsingState {
            active_template: true,
        });

        let result = (|| {
            let scalar = self.accept(TokenKind::ScalarType)?.spell;
            self.accept(TokenKind::Comma)?;
            let rows = self.parse_and_evaluate_vector_dimension()?;
            self.accept(TokenKind::Comma)?;
            let cols = self.parse_and_evaluate_vector_dimension()?;
            let keyword = format!("{}{}x{}", scalar, rows, cols);
            DataType::from_keyword(&keyword)
                .map(TypeDenoter::Base)
                .ok_or_else(|| {
                    CompilerError::Syntax(
                        format!("invalid matrix type '{}'", keyword),
                        Some(self.area()),
                    )
                })
        })();

        let close = self.accept_spell(TokenKind::BinaryOp, ">");
        self.pop_parsing_state();
        close?;
        result
    }

    fn parse_type_denoter_with_struct_decl_opt(
        &mut self,
        struct_decl: &mut Option<StructDecl>,
        allow_void: bool,
    ) -> Result<TypeDenoter> {
        if !self.is(TokenKind::Struct) {
            return self.parse_type_denoter(allow_void);
        }

        self.accept_it();

        if self.is(TokenKind::LBrace) {
            // Anonymous structure declaration.
            let decl = self.parse_struct_decl(false, None)?;
            let denoter = TypeDenoter::Struct(decl.ident.clone());
            *struct_decl = Some(decl);
            return Ok(denoter);
        }

        let ident_tkn = self.accept(TokenKind::Ident)?;

        if self.is(TokenKind::LBrace) || self.is(TokenKind::Colon) {
            let decl = self.parse_struct_decl(false, Some(ident_tkn))?;
            let denoter = TypeDenoter::Struct(decl.ident.clone());
            *struct_decl = Some(decl);
            Ok(denoter)
        } else {
            Ok(TypeDenoter::Struct(ident_tkn.spell))
        }
    }

    fn parse_data_type_keyword(&mut self) -> Result<Option<DataType>> {
        let token = self.accept_it();
        match DataType::from_keyword(&token.spell) {
            Some(data_type) => Ok(Some(data_type)),
            None => Err(CompilerError::Syntax(
                format!("unknown data type '{}'", token.spell),
                Some(token.area()),
            )),
        }
    }

    fn parse_storage_class(&mut self) -> Result<StorageClass> {
        let token = self.accept(TokenKind::StorageClass)?;
        StorageClass::from_spell(&token.spell).ok_or_else(|| {
            CompilerError::Syntax(
                format!("unknown storage class '{}'", token.spell),
                Some(token.area()),
            )
        })
    }

    fn parse_ident(&mut self) -> Result<String> {
        Ok(self.accept(TokenKind::Ident)?.spell)
    }

    /* ----- Constant expressions ----- */

    fn parse_and_evaluate_const_expr(&mut self) -> Result<Variant> {
        let area = self.area();
        let expr = self.parse_expr(false, None)?;
        evaluate_const_expr(&expr)
            .map_err(|err| CompilerError::Syntax(err.message(), err.area.or(Some(area))))
    }

    fn parse_and_evaluate_const_expr_int(&mut self) -> Result<i64> {
        let area = self.area();
        match self.parse_and_evaluate_const_expr()? {
            Variant::Int(value) => Ok(value),
            _ => Err(CompilerError::Syntax(
                "expected integral constant expression".to_string(),
                Some(area),
            )),
        }
    }

    fn parse_and_evaluate_vector_dimension(&mut self) -> Result<i64> {
        let area = self.area();
        let value = self.parse_and_evaluate_const_expr_int()?;
        if !(1..=4).contains(&value) {
            return Err(CompilerError::Syntax(
                "vector and matrix dimensions must be between 1 and 4".to_string(),
                Some(area),
            ));
        }
        Ok(value)
    }

    /// Evaluates array dimension expressions to constants; non-constant or
    /// dynamic dimensions become `None`.
    fn evaluate_array_dims(&self, dims: &[Expr]) -> Vec<Option<i64>> {
        dims.iter()
            .map(|dim| match evaluate_const_expr(dim) {
                Ok(Variant::Int(value)) => Some(value),
                _ => None,
            })
            .collect()
    }

    /* ----- Techniques ----- */

    /// Technique blocks are scanned until braces balance, then dropped.
    fn parse_and_ignore_technique(&mut self) -> Result<()> {
        let area = self.area();
        self.accept(TokenKind::Technique)?;
        self.warning("techniques are ignored", area);

        while !self.is(TokenKind::LBrace) {
            if self.is(TokenKind::EndOfStream) {
                return self.error("missing technique block");
            }
            self.accept_it();
        }

        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                TokenKind::EndOfStream => {
                    return self.error("missing closing brace '}' for open code block")
                }
                _ => {}
            }
            self.accept_it();
            if depth == 0 {
                break;
            }
        }
        Ok(())
    }

    fn warn_on_null_stmt(&mut self, stmt: &Stmt, stmt_name: &str) {
        if matches!(stmt.kind, StmtKind::Null) {
            let area = stmt.area;
            self.warning(&format!("<{}> statement with empty body", stmt_name), area);
        }
    }
}

/// Maps a shader profile prefix ("vs_5_0", "ps", ...) to its target stage.
fn shader_profile_to_target(profile: &str) -> Option<ShaderTarget> {
    let target = match profile.get(..2)? {
        "vs" => ShaderTarget::Vertex,
        "hs" => ShaderTarget::TessellationControl,
        "ds" => ShaderTarget::TessellationEvaluation,
        "gs" => ShaderTarget::Geometry,
        "ps" => ShaderTarget::Fragment,
        "cs" => ShaderTarget::Compute,
        _ => return None,
    };
    Some(target)
}

