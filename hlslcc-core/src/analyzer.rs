//! Context analysis: decorates the parse tree with resolved symbols,
//! validates types and casts, remaps semantics, dispatches intrinsics and
//! flattens entry-point inputs and outputs.

use crate::ast::*;
use crate::error::{CompilerError, Result};
use crate::eval::{evaluate_const_expr, Variant};
use crate::intrinsics::{
    find_intrinsic, upgrade_intrinsic, Intrinsic, IntrinsicCategory, ShaderModel,
};
use crate::report::ReportHandler;
use crate::source::SourceArea;
use crate::symbol_table::{
    FuncSignature, RegisterOutcome, Symbol, SymbolTable, TextureSymbol, VarSymbol,
};
use crate::ty::{DataType, ScalarType, TypeDenoter};
use crate::{
    Binding, ComparisonFunc, InputShaderVersion, SamplerFilter, SamplerState, ShaderTarget,
    Statistics, TextureAddressMode,
};
use log::debug;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
struct StructMember {
    ident: String,
    type_denoter: TypeDenoter,
    semantic: Option<IndexedSemantic>,
    flags: Flags,
}

#[derive(Debug, Clone, Default)]
struct StructRecord {
    base: Option<String>,
    members: Vec<StructMember>,
    flags: Flags,
}

pub struct Analyzer<'a, 'l, 's> {
    reports: &'a mut ReportHandler<'l>,
    symtab: SymbolTable,
    structs: HashMap<String, StructRecord>,
    entry_point: String,
    shader_target: ShaderTarget,
    version_in: InputShaderVersion,
    shader_model: ShaderModel,
    prefer_wrappers: bool,
    statistics: Option<&'s mut Statistics>,
    struct_stack: Vec<String>,
    func_decl_level: u32,
    entry_point_level: Option<u32>,
    program_flags: Flags,
    entry_info: Option<EntryPointInfo>,
    /// Local variables aliasing the output interface block.
    disabled_vars: HashSet<String>,
}

fn shader_model_of(version: InputShaderVersion) -> ShaderModel {
    match version {
        InputShaderVersion::Hlsl3 => ShaderModel::new(3, 0),
        InputShaderVersion::Hlsl4 => ShaderModel::new(4, 0),
        InputShaderVersion::Hlsl5 => ShaderModel::new(5, 0),
    }
}

impl<'a, 'l, 's> Analyzer<'a, 'l, 's> {
    pub fn new(
        entry_point: &str,
        shader_target: ShaderTarget,
        version_in: InputShaderVersion,
        prefer_wrappers: bool,
        statistics: Option<&'s mut Statistics>,
        reports: &'a mut ReportHandler<'l>,
    ) -> Self {
        Analyzer {
            reports,
            symtab: SymbolTable::new(),
            structs: HashMap::new(),
            entry_point: entry_point.to_string(),
            shader_target,
            version_in,
            shader_model: shader_model_of(version_in),
            prefer_wrappers,
            statistics,
            struct_stack: Vec::new(),
            func_decl_level: 0,
            entry_point_level: None,
            program_flags: Flags::default(),
            entry_info: None,
            disabled_vars: HashSet::new(),
        }
    }

    /// Decorates the program. Returns false if at least one error was
    /// recorded (the program is still decorated as far as possible).
    pub fn decorate(mut self, program: &mut Program) -> bool {
        let errors_before = self.reports.num_errors();

        let mut stmts = std::mem::take(&mut program.global_stmts);
        for stmt in &mut stmts {
            self.visit_global_stmt(stmt);
        }

        if self.entry_info.is_none() {
            self.reports.error(
                &format!("entry point '{}' not found", self.entry_point),
                None,
            );
        }

        self.backfill_struct_flags(&mut stmts);
        program.global_stmts = stmts;
        program.flags.0 |= self.program_flags.0;
        program.entry_point = self.entry_info.take();

        self.reports.num_errors() == errors_before
    }

    /* ----- Diagnostics ----- */

    fn error(&mut self, message: &str, area: Option<SourceArea>) {
        self.reports.error(message, area);
    }

    fn error_undeclared(&mut self, ident: &str, area: Option<SourceArea>) {
        self.reports.submit(
            crate::report::Severity::Error,
            &format!("undeclared identifier '{}'", ident),
            area,
            Some("undeclared-identifier"),
        );
    }

    fn warning(&mut self, message: &str, area: Option<SourceArea>) {
        self.reports.warning(message, area);
    }

    fn register_symbol(&mut self, ident: &str, symbol: Symbol, area: Option<SourceArea>) {
        if let RegisterOutcome::Rejected(message) = self.symtab.register(ident, symbol) {
            self.error(&message, area);
        }
    }

    /* ----- Global statements ----- */

    fn visit_global_stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::FunctionDecl(decl) => self.analyze_function_decl(decl),
            StmtKind::BufferDecl(decl) => self.visit_buffer_decl_stmt(decl),
            StmtKind::TextureDecl(decl) => self.visit_texture_decl_stmt(decl),
            StmtKind::SamplerDecl(decl) => self.visit_sampler_decl_stmt(decl),
            StmtKind::StructDecl(decl) => {
                self.analyze_struct_decl(&mut decl.struct_decl);
            }
            StmtKind::VarDecl(decl) => self.visit_var_decl_stmt(decl, None),
            StmtKind::AliasDecl(decl) => self.visit_alias_decl_stmt(decl),
            _ => {}
        }
    }

    fn analyze_function_decl(&mut self, decl: &mut FunctionDecl) {
        self.reports.push_context(decl.signature_to_string());

        let is_entry_point = decl.ident == self.entry_point && self.entry_info.is_none();

        if let Some(semantic) = &mut decl.semantic {
            self.analyze_semantic(semantic);
        }

        // Analyze the inline struct declaration of the return type first so
        // the structure is known when flattening entry-point outputs.
        if let Some(struct_decl) = &mut decl.return_type.struct_decl {
            self.analyze_struct_decl(struct_decl);
        }
        self.resolve_var_type(&mut decl.return_type);

        let signature = FuncSignature {
            params: decl
                .parameters
                .iter()
                .map(|p| self.resolve_type(&p.var_type.type_denoter, Some(p.area)))
                .collect(),
            return_type: self.resolve_type(&decl.return_type.type_denoter, Some(decl.area)),
            has_body: decl.has_body(),
        };
        self.register_symbol(&decl.ident, Symbol::Func(signature), Some(decl.area));

        for attrib in &mut decl.attribs {
            for arg in &mut attrib.arguments {
                self.visit_expr(arg);
            }
        }

        self.symtab.open_scope();

        for param in &mut decl.parameters {
            self.visit_var_decl_stmt(param, None);
        }

        if is_entry_point {
            self.analyze_entry_point(decl);
        }

        self.func_decl_level += 1;
        if is_entry_point {
            self.entry_point_level = Some(self.func_decl_level);
        }
        self.disabled_vars.clear();

        let mut code_block = decl.code_block.take();
        if let Some(block) = &mut code_block {
            self.visit_code_block(block);

            if is_entry_point {
                let disabled = std::mem::take(&mut self.disabled_vars);
                if !disabled.is_empty() {
                    disable_var_codegen(block, &disabled);
                }
            }

            mark_end_of_function(block);
        }
        decl.code_block = code_block;

        if is_entry_point {
            self.entry_point_level = None;
        }
        self.func_decl_level -= 1;

        self.symtab.close_scope();
        self.reports.pop_context();
    }

    fn inside_entry_point(&self) -> bool {
        self.entry_point_level
            .map(|level| self.func_decl_level >= level)
            .unwrap_or(false)
    }

    fn visit_buffer_decl_stmt(&mut self, decl: &mut BufferDeclStmt) {
        // Buffers can only be bound to one slot, and never per-stage.
        if decl.slot_registers.len() > 1 {
            let area = decl.slot_registers[1].area;
            self.reports.submit(
                crate::report::Severity::Error,
                "buffers can only be bound to one slot",
                Some(area),
                Some("invalid-binding"),
            );
        }
        let target_specific: Vec<SourceArea> = decl
            .slot_registers
            .iter()
            .filter(|r| r.shader_target.is_some())
            .map(|r| r.area)
            .collect();
        for area in target_specific {
            self.error(
                "user-defined constant buffer slots can not be target specific",
                Some(area),
            );
        }

        if let Some(stats) = self.statistics.as_deref_mut() {
            let location = decl
                .slot_registers
                .first()
                .map(|r| r.slot)
                .unwrap_or(0);
            stats.constant_buffers.push(Binding {
                location,
                ident: decl.ident.clone(),
            });
        }

        let buffer_ident = decl.ident.clone();
        for member in &mut decl.members {
            self.visit_var_decl_stmt(member, Some(&buffer_ident));
        }
    }

    fn visit_texture_decl_stmt(&mut self, stmt: &mut TextureDeclStmt) {
        for decl in &mut stmt.texture_decls {
            self.register_symbol(
                &decl.ident,
                Symbol::Texture(TextureSymbol {
                    texture_type: stmt.texture_type,
                    color_type: stmt.color_type,
                }),
                Some(decl.area),
            );

            if let Some(stats) = self.statistics.as_deref_mut() {
                let location = decl
                    .slot_registers
                    .first()
                    .map(|r| r.slot)
                    .unwrap_or(0);
                stats.textures.push(Binding {
                    location,
                    ident: decl.ident.clone(),
                });
            }
        }
    }

    fn visit_sampler_decl_stmt(&mut self, stmt: &mut SamplerDeclStmt) {
        for decl in &mut stmt.sampler_decls {
            self.register_symbol(&decl.ident, Symbol::Sampler, Some(decl.area));

            if self.statistics.is_some() {
                let mut state = SamplerState::default();
                for value in &decl.sampler_values {
                    self.analyze_sampler_value(value, &mut state);
                }
                if let Some(stats) = self.statistics.as_deref_mut() {
                    stats.sampler_states.insert(decl.ident.clone(), state);
                }
            }
        }
    }

    fn visit_alias_decl_stmt(&mut self, stmt: &mut AliasDeclStmt) {
        if let Some(struct_decl) = &mut stmt.struct_decl {
            self.analyze_struct_decl(struct_decl);
        }
        for alias in &stmt.alias_decls {
            // Resolution checks for unknown targets and alias cycles.
            self.resolve_type(&alias.type_denoter, Some(alias.area));
            self.register_symbol(
                &alias.ident,
                Symbol::AliasType(alias.type_denoter.clone()),
                Some(alias.area),
            );
        }
    }

    fn analyze_struct_decl(&mut self, decl: &mut StructDecl) {
        if decl.flags.has(Flags::IS_NESTED_STRUCT) && !decl.is_anonymous() {
            self.error("nested structures must be anonymous", Some(decl.area));
        }

        let base = match &decl.base_struct_name {
            Some(base_name) => {
                if !self.structs.contains_key(base_name) {
                    self.error_undeclared(base_name, Some(decl.area));
                    None
                } else {
                    Some(base_name.clone())
                }
            }
            None => None,
        };

        if !decl.is_anonymous() {
            self.register_symbol(
                &decl.ident,
                Symbol::StructType(decl.ident.clone()),
                Some(decl.area),
            );
        }

        self.struct_stack.push(decl.ident.clone());
        self.symtab.open_scope();

        let mut members = Vec::new();
        for member_stmt in &mut decl.members {
            // Member types may declare nested structures.
            if let Some(nested) = &mut member_stmt.var_type.struct_decl {
                nested.flags.set(Flags::IS_NESTED_STRUCT);
                self.analyze_struct_decl(nested);
            }
            self.resolve_var_type(&mut member_stmt.var_type);

            for var_decl in &mut member_stmt.var_decls {
                if let Some(semantic) = &mut var_decl.semantic {
                    self.analyze_semantic(semantic);
                    if semantic.is_system_value() {
                        var_decl.flags.set(Flags::IS_SYSTEM_VALUE);
                    }
                }
                self.register_symbol(
                    &var_decl.ident,
                    Symbol::Var(VarSymbol {
                        type_denoter: member_stmt.var_type.type_denoter.clone(),
                        semantic: var_decl.semantic.clone(),
                        is_const: false,
                        buffer_ident: None,
                    }),
                    Some(var_decl.area),
                );
                members.push(StructMember {
                    ident: var_decl.ident.clone(),
                    type_denoter: self.resolve_type(
                        &member_stmt.var_type.type_denoter,
                        Some(var_decl.area),
                    ),
                    semantic: var_decl.semantic.clone(),
                    flags: var_decl.flags,
                });
            }
        }

        self.symtab.close_scope();
        self.struct_stack.pop();

        if decl.num_members() == 0 {
            self.warning(
                &format!("'{}' is completely empty", decl.signature_to_string()),
                Some(decl.area),
            );
        }

        if !decl.is_anonymous() {
            self.structs.insert(
                decl.ident.clone(),
                StructRecord {
                    base,
                    members,
                    flags: decl.flags,
                },
            );
        }
    }

    fn visit_var_decl_stmt(&mut self, stmt: &mut VarDeclStmt, buffer_ident: Option<&str>) {
        if let Some(struct_decl) = &mut stmt.var_type.struct_decl {
            self.analyze_struct_decl(struct_decl);
        }
        self.resolve_var_type(&mut stmt.var_type);

        let is_const = stmt.is_const();
        let base_denoter = stmt.var_type.type_denoter.clone();

        let mut var_decls = std::mem::take(&mut stmt.var_decls);
        for decl in &mut var_decls {
            if let Some(semantic) = &mut decl.semantic {
                self.analyze_semantic(semantic);
                if semantic.is_system_value() {
                    decl.flags.set(Flags::IS_SYSTEM_VALUE);
                }
                if semantic.system_value() == Some(SystemValue::Position)
                    && self.shader_target == ShaderTarget::Fragment
                {
                    self.program_flags.set(Flags::IS_FRAG_COORD_USED);
                }
            }

            let type_denoter = if decl.array_dims.is_empty() {
                base_denoter.clone()
            } else {
                let dims = decl
                    .array_dims
                    .iter()
                    .map(|dim| match evaluate_const_expr(dim) {
                        Ok(Variant::Int(value)) => Some(value),
                        _ => None,
                    })
                    .collect();
                TypeDenoter::Array(Box::new(base_denoter.clone()), dims)
            };

            for dim in &mut decl.array_dims {
                self.visit_expr(dim);
            }

            self.register_symbol(
                &decl.ident,
                Symbol::Var(VarSymbol {
                    type_denoter: type_denoter.clone(),
                    semantic: decl.semantic.clone(),
                    is_const,
                    buffer_ident: buffer_ident.map(str::to_string),
                }),
                Some(decl.area),
            );

            if let Some(initializer) = &mut decl.initializer {
                self.visit_expr(initializer);
                self.validate_type_cast_from_expr(initializer, &type_denoter, decl.area);
            }
        }
        stmt.var_decls = var_decls;
    }

    /* ----- Statements ----- */

    fn visit_code_block(&mut self, block: &mut CodeBlock) {
        self.symtab.open_scope();
        for stmt in &mut block.stmts {
            self.visit_stmt(stmt);
        }
        self.symtab.close_scope();
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Null | StmtKind::CtrlTransfer(_) => {}
            StmtKind::CodeBlock(block) => self.visit_code_block(block),
            StmtKind::FunctionDecl(_) => {
                let area = stmt.area;
                self.error("local function declarations are not allowed", Some(area));
            }
            StmtKind::BufferDecl(_) => {}
            StmtKind::TextureDecl(decl) => self.visit_texture_decl_stmt(decl),
            StmtKind::SamplerDecl(decl) => self.visit_sampler_decl_stmt(decl),
            StmtKind::StructDecl(decl) => self.analyze_struct_decl(&mut decl.struct_decl),
            StmtKind::VarDecl(decl) => self.visit_var_decl_stmt(decl, None),
            StmtKind::AliasDecl(decl) => self.visit_alias_decl_stmt(decl),
            StmtKind::For {
                init,
                condition,
                iteration,
                body,
                ..
            } => {
                self.symtab.open_scope();
                self.visit_stmt(init);
                if let Some(condition) = condition {
                    self.visit_expr(condition);
                }
                if let Some(iteration) = iteration {
                    self.visit_expr(iteration);
                }
                self.visit_stmt(body);
                self.symtab.close_scope();
            }
            StmtKind::While { condition, body, .. } => {
                self.symtab.open_scope();
                self.visit_expr(condition);
                self.visit_stmt(body);
                self.symtab.close_scope();
            }
            StmtKind::DoWhile { body, condition, .. } => {
                self.symtab.open_scope();
                self.visit_stmt(body);
                self.visit_expr(condition);
                self.symtab.close_scope();
            }
            StmtKind::If {
                condition,
                body,
                else_stmt,
                ..
            } => {
                self.symtab.open_scope();
                self.visit_expr(condition);
                self.visit_stmt(body);
                self.symtab.close_scope();
                if let Some(else_stmt) = else_stmt {
                    self.symtab.open_scope();
                    self.visit_stmt(&mut else_stmt.body);
                    self.symtab.close_scope();
                }
            }
            StmtKind::Switch {
                selector, cases, ..
            } => {
                self.symtab.open_scope();
                self.visit_expr(selector);
                for case in cases {
                    if let Some(expr) = &mut case.expr {
                        self.visit_expr(expr);
                    }
                    for stmt in &mut case.stmts {
                        self.visit_stmt(stmt);
                    }
                }
                self.symtab.close_scope();
            }
            StmtKind::Expr(expr) => {
                self.visit_expr(expr);
                let _ = self.type_of_expr_reporting(expr);

                // Wrapper inlining for statement-level intrinsic calls.
                if !self.prefer_wrappers {
                    if let ExprKind::Call(call) = &mut expr.kind {
                        if call.intrinsic == Some(Intrinsic::Clip) {
                            call.flags.set(Flags::CAN_INLINE_INTRINSIC_WRAPPER);
                        }
                    }
                }
            }
            StmtKind::Return(expr) => {
                if let Some(expr) = expr {
                    self.visit_expr(expr);
                    let _ = self.type_of_expr_reporting(expr);
                    if self.inside_entry_point() {
                        self.analyze_entry_point_return(expr);
                    }
                }
            }
        }
    }

    /// A `return o;` of a struct-typed local inside the entry point makes
    /// `o` an alias for the output interface; its declaration is dropped
    /// from code generation.
    fn analyze_entry_point_return(&mut self, expr: &Expr) {
        let access = match &expr.kind {
            ExprKind::VarAccess(access) if access.var_ident.next.is_none() => access,
            _ => return,
        };
        let ident = access.var_ident.ident.clone();

        let is_output_struct = match self.symtab.fetch_single(&ident) {
            Some(Symbol::Var(var)) => {
                let resolved = self.resolve_type_quiet(&var.type_denoter);
                match (&resolved, &self.entry_info) {
                    (TypeDenoter::Struct(struct_ident), Some(info)) => {
                        info.return_struct.as_deref() == Some(struct_ident.as_str())
                    }
                    _ => false,
                }
            }
            _ => false,
        };

        if is_output_struct {
            self.disabled_vars.insert(ident.clone());
            if let Some(info) = &mut self.entry_info {
                info.output_alias = Some(ident);
            }
        }
    }

    /* ----- Expressions ----- */

    fn visit_expr(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Null | ExprKind::Literal(_) => {}
            ExprKind::TypeName(denoter) => {
                let resolved = self.resolve_type(denoter, Some(expr.area));
                let _ = resolved;
            }
            ExprKind::List(first, next) => {
                self.visit_expr(first);
                self.visit_expr(next);
            }
            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                self.visit_expr(condition);
                self.visit_expr(then_expr);
                self.visit_expr(else_expr);
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.visit_expr(lhs);
                self.visit_expr(rhs);
            }
            ExprKind::Unary { expr, .. } | ExprKind::PostUnary { expr, .. } => {
                self.visit_expr(expr);
            }
            ExprKind::Call(call) => self.analyze_function_call(call),
            ExprKind::Bracket(inner) => self.visit_expr(inner),
            ExprKind::Suffix { expr: inner, var_ident } => {
                self.visit_expr(inner);
                let inner_type = self.type_of_expr(inner).ok();
                if let Some(TypeDenoter::Struct(struct_ident)) =
                    inner_type.map(|t| self.resolve_type_quiet(&t))
                {
                    let ident = var_ident.ident.clone();
                    let area = var_ident.area;
                    if self.fetch_from_struct(&struct_ident, &ident).is_none() {
                        self.error(
                            &format!(
                                "identifier '{}' is not a member of 'struct {}'",
                                ident, struct_ident
                            ),
                            Some(area),
                        );
                    } else {
                        var_ident.symbol = Some(SymbolKind::Variable);
                    }
                }
            }
            ExprKind::ArrayAccess { expr: inner, indices } => {
                self.visit_expr(inner);
                for index in indices {
                    self.visit_expr(index);
                }
            }
            ExprKind::Cast {
                type_denoter,
                expr: inner,
            } => {
                self.resolve_type(type_denoter, Some(expr.area));
                self.visit_expr(inner);
                let area = inner.area;
                if let Ok(src) = self.type_of_expr(inner) {
                    let dst = type_denoter.clone();
                    self.validate_type_cast(&src, &dst, true, area);
                }
            }
            ExprKind::VarAccess(access) => self.analyze_var_access(access),
            ExprKind::Initializer(exprs) => {
                for expr in exprs {
                    self.visit_expr(expr);
                }
            }
        }
    }

    fn analyze_var_access(&mut self, access: &mut VarAccessExpr) {
        self.analyze_var_ident(&mut access.var_ident);

        if let Some(assign_expr) = &mut access.assign_expr {
            self.visit_expr(assign_expr);
        }
        if let Some(assign_expr) = &access.assign_expr {
            if let Ok(dst) = self.type_of_var_ident(&access.var_ident) {
                self.validate_type_cast_from_expr(assign_expr, &dst, access.var_ident.area);
            }
        }
    }

    fn analyze_var_ident(&mut self, var_ident: &mut VarIdent) {
        for index in &mut var_ident.array_indices {
            self.visit_expr(index);
        }

        let symbol = match self.symtab.fetch_single(&var_ident.ident) {
            Some(symbol) => symbol.clone(),
            None => {
                let ident = var_ident.ident.clone();
                self.error_undeclared(&ident, Some(var_ident.area));
                return;
            }
        };

        match symbol {
            Symbol::Var(var) => {
                var_ident.symbol = Some(SymbolKind::Variable);
                let peeled = var
                    .type_denoter
                    .peel_array(var_ident.array_indices.len());
                self.decorate_var_ident_chain(var_ident, &peeled);

                if var.semantic.as_ref().and_then(|s| s.system_value())
                    == Some(SystemValue::Position)
                    && self.shader_target == ShaderTarget::Fragment
                {
                    self.program_flags.set(Flags::IS_FRAG_COORD_USED);
                }
            }
            Symbol::Texture(_) => {
                var_ident.symbol = Some(SymbolKind::Texture);
            }
            Symbol::Sampler => {
                var_ident.symbol = Some(SymbolKind::Sampler);
            }
            Symbol::StructType(_) => {
                var_ident.symbol = Some(SymbolKind::StructType);
            }
            Symbol::AliasType(_) => {
                var_ident.symbol = Some(SymbolKind::AliasType);
            }
            Symbol::Func(_) => {
                var_ident.symbol = Some(SymbolKind::Function);
            }
        }
    }

    /// Decorates the dotted tail of an identifier chain against struct
    /// members and vector subscripts.
    fn decorate_var_ident_chain(&mut self, var_ident: &mut VarIdent, type_denoter: &TypeDenoter) {
        let next = match &mut var_ident.next {
            Some(next) => next,
            None => return,
        };

        let resolved = self.resolve_type_quiet(type_denoter);
        match resolved {
            TypeDenoter::Struct(struct_ident) => {
                let member = self.fetch_from_struct(&struct_ident, &next.ident);
                match member {
                    Some(member_type) => {
                        next.symbol = Some(SymbolKind::Variable);
                        let peeled = member_type.peel_array(next.array_indices.len());
                        self.decorate_var_ident_chain(next, &peeled);
                    }
                    None => {
                        let message = format!(
                            "identifier '{}' is not a member of 'struct {}'",
                            next.ident, struct_ident
                        );
                        let area = next.area;
                        self.error(&message, Some(area));
                    }
                }
            }
            TypeDenoter::Base(data_type) if !matches!(data_type, DataType::String) => {
                // Vector or scalar subscript (swizzle); validated lazily.
                next.symbol = Some(SymbolKind::Variable);
            }
            _ => {
                let message = format!(
                    "invalid member access '{}' for type '{}'",
                    next.ident, type_denoter
                );
                let area = next.area;
                self.error(&message, Some(area));
            }
        }
    }

    /// Walks the inheritance chain (single inheritance) for a member.
    fn fetch_from_struct(&self, struct_ident: &str, member: &str) -> Option<TypeDenoter> {
        let mut current = Some(struct_ident.to_string());
        let mut guard = 0;
        while let Some(ident) = current {
            let record = self.structs.get(&ident)?;
            if let Some(found) = record.members.iter().find(|m| m.ident == member) {
                return Some(found.type_denoter.clone());
            }
            current = record.base.clone();
            guard += 1;
            if guard > 64 {
                break;
            }
        }
        None
    }

    /* ----- Function calls ----- */

    fn analyze_function_call(&mut self, call: &mut FunctionCall) {
        for arg in &mut call.arguments {
            self.visit_expr(arg);
        }

        let var_ident = match &mut call.var_ident {
            Some(var_ident) => var_ident,
            None => {
                // Type constructor, e.g. 'float4(...)'.
                if let Some(denoter) = &call.type_denoter {
                    let denoter = denoter.clone();
                    self.resolve_type(&denoter, Some(call.area));
                }
                return;
            }
        };

        if var_ident.next.is_some() {
            // Object method call: resolve the prefix first.
            self.analyze_var_ident(var_ident);

            let method = var_ident.last_ident().to_string();
            let object_is_texture = var_ident.symbol == Some(SymbolKind::Texture);

            if let Some(entry) = find_intrinsic(&method) {
                if object_is_texture && entry.category != IntrinsicCategory::Texture {
                    let message =
                        format!("invalid intrinsic '{}' for a texture object", method);
                    let area = call.area;
                    self.error(&message, Some(area));
                    return;
                }
                if entry.category == IntrinsicCategory::Texture && !object_is_texture {
                    let message = format!(
                        "intrinsic '{}' can only be called on a texture object",
                        method
                    );
                    let area = call.area;
                    self.error(&message, Some(area));
                    return;
                }
                self.analyze_intrinsic_call(call, entry.intrinsic, entry.min_shader_model);
            }
        } else {
            let ident = var_ident.ident.clone();
            if let Some(entry) = find_intrinsic(&ident) {
                if entry.category == IntrinsicCategory::Texture {
                    let message = format!(
                        "intrinsic '{}' can only be called on a texture object",
                        ident
                    );
                    let area = call.area;
                    self.error(&message, Some(area));
                    return;
                }
                self.analyze_intrinsic_call(call, entry.intrinsic, entry.min_shader_model);
            } else {
                if let Some(ident_slot) = &mut call.var_ident {
                    ident_slot.symbol = Some(SymbolKind::Function);
                }
                let area = call.area;
                self.fetch_function_decl(&ident, &call.arguments, area);
            }
        }
    }

    fn analyze_intrinsic_call(
        &mut self,
        call: &mut FunctionCall,
        intrinsic: Intrinsic,
        min_shader_model: ShaderModel,
    ) {
        if self.shader_model < min_shader_model {
            let name = call
                .var_ident
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default();
            let message = format!(
                "intrinsic '{}' requires shader model {}, but only {} is specified",
                name, min_shader_model, self.shader_model
            );
            let area = call.area;
            self.warning(&message, Some(area));
        }

        call.intrinsic = Some(upgrade_intrinsic(intrinsic, call.arguments.len()));

        // The emitted form of 'clip' depends on whether its argument is a
        // scalar or a vector, so the resolved type is recorded on the call.
        if call.intrinsic == Some(Intrinsic::Clip) {
            call.intrinsic_arg_type = call
                .arguments
                .first()
                .and_then(|arg| self.type_of_expr(arg).ok())
                .map(|t| self.resolve_type_quiet(&t))
                .and_then(|t| t.base_type());
        }

        debug!(
            "intrinsic call resolved to {:?} ({} arguments)",
            call.intrinsic,
            call.arguments.len()
        );
    }

    /// Overload resolution: an exact parameter-type match beats implicit
    /// conversions; two equally good candidates are a hard error.
    fn fetch_function_decl(
        &mut self,
        ident: &str,
        arguments: &[Expr],
        area: SourceArea,
    ) -> Option<FuncSignature> {
        let overloads: Vec<FuncSignature> = match self.symtab.fetch(ident) {
            Some(symbols) => symbols
                .iter()
                .filter_map(|s| match s {
                    Symbol::Func(sig) => Some(sig.clone()),
                    _ => None,
                })
                .collect(),
            None => {
                self.error_undeclared(ident, Some(area));
                return None;
            }
        };
        if overloads.is_empty() {
            self.error(
                &format!("identifier '{}' does not name a function", ident),
                Some(area),
            );
            return None;
        }

        let arg_types: Vec<Option<TypeDenoter>> = arguments
            .iter()
            .map(|arg| self.type_of_expr(arg).ok().map(|t| self.resolve_type_quiet(&t)))
            .collect();

        let candidates: Vec<&FuncSignature> = overloads
            .iter()
            .filter(|sig| sig.params.len() == arg_types.len())
            .collect();
        if candidates.is_empty() {
            self.error(
                &format!(
                    "no overload of function '{}' takes {} arguments",
                    ident,
                    arg_types.len()
                ),
                Some(area),
            );
            return None;
        }

        let exact: Vec<&&FuncSignature> = candidates
            .iter()
            .filter(|sig| {
                sig.params.iter().zip(&arg_types).all(|(param, arg)| match arg {
                    Some(arg) => self.resolve_type_quiet(param) == *arg,
                    None => true,
                })
            })
            .collect();

        match exact.len() {
            1 => return Some((**exact[0]).clone()),
            0 => {}
            _ => {
                self.error(
                    &format!("ambiguous call to function '{}'", ident),
                    Some(area),
                );
                return None;
            }
        }

        let convertible: Vec<&&FuncSignature> = candidates
            .iter()
            .filter(|sig| {
                sig.params.iter().zip(&arg_types).all(|(param, arg)| match arg {
                    Some(arg) => self.can_cast(arg, &self.resolve_type_quiet(param), false),
                    None => true,
                })
            })
            .collect();

        match convertible.len() {
            1 => Some((**convertible[0]).clone()),
            0 => {
                self.error(
                    &format!("no matching overload for call to function '{}'", ident),
                    Some(area),
                );
                None
            }
            _ => {
                self.error(
                    &format!("ambiguous call to function '{}'", ident),
                    Some(area),
                );
                None
            }
        }
    }

    /* ----- Entry point ----- */

    fn analyze_entry_point(&mut self, decl: &mut FunctionDecl) {
        debug!("analyzing entry point '{}'", decl.ident);

        decl.flags.set(Flags::IS_ENTRY_POINT);
        let mut info = EntryPointInfo {
            ident: decl.ident.clone(),
            ..EntryPointInfo::default()
        };

        // [numthreads(x, y, z)]
        for attrib in &decl.attribs {
            if attrib.ident.eq_ignore_ascii_case("numthreads") {
                if attrib.arguments.len() == 3 {
                    let mut sizes = [1u32; 3];
                    let mut valid = true;
                    for (i, arg) in attrib.arguments.iter().enumerate() {
                        match evaluate_const_expr(arg) {
                            Ok(Variant::Int(value)) if value > 0 => sizes[i] = value as u32,
                            _ => valid = false,
                        }
                    }
                    if valid {
                        info.num_threads = Some(sizes);
                    } else {
                        self.error(
                            "invalid argument in 'numthreads' attribute",
                            Some(attrib.area),
                        );
                    }
                } else {
                    self.error(
                        "'numthreads' attribute requires three arguments",
                        Some(attrib.area),
                    );
                }
            }
        }

        // Parameters.
        let mut parameters = std::mem::take(&mut decl.parameters);
        for param in &mut parameters {
            if param.var_decls.len() != 1 {
                self.error(
                    "invalid number of variable declarations in function parameter",
                    Some(param.area),
                );
                continue;
            }
            let is_input = param.is_input();
            let is_output = param.is_output();
            let type_denoter = self.resolve_type_quiet(&param.var_type.type_denoter);
            let var_decl = &mut param.var_decls[0];

            if is_input {
                self.analyze_entry_point_io(&mut info, var_decl, &type_denoter, true);
            }
            if is_output {
                self.analyze_entry_point_io(&mut info, var_decl, &type_denoter, false);
            }
        }
        decl.parameters = parameters;

        // Return value.
        let return_type = self.resolve_type_quiet(&decl.return_type.type_denoter);
        match &return_type {
            TypeDenoter::Struct(struct_ident) => {
                info.return_struct = Some(struct_ident.clone());
                let struct_ident = struct_ident.clone();
                self.flatten_struct_io(&mut info, &struct_ident, false);
            }
            TypeDenoter::Base(data_type) => {
                if let Some(semantic) = &decl.semantic {
                    let mut flags = Flags::default();
                    if semantic.is_system_value() {
                        flags.set(Flags::IS_SYSTEM_VALUE);
                    }
                    flags.set(Flags::IS_SHADER_OUTPUT);
                    info.outputs.push(IoVar {
                        ident: String::new(),
                        data_type: *data_type,
                        semantic: semantic.clone(),
                        flags,
                    });
                } else {
                    self.error(
                        "missing semantic for entry point return value",
                        Some(decl.area),
                    );
                }
            }
            TypeDenoter::Void => {}
            other => {
                self.error(
                    &format!("invalid entry point return type '{}'", other),
                    Some(decl.area),
                );
            }
        }

        // Fragment targets for the statistics sink.
        if self.shader_target == ShaderTarget::Fragment {
            if let Some(stats) = self.statistics.as_deref_mut() {
                for output in &info.outputs {
                    if output.semantic.system_value() == Some(SystemValue::Target) {
                        stats.fragment_targets.push(Binding {
                            location: output.semantic.index as i32,
                            ident: if output.ident.is_empty() {
                                decl.ident.clone()
                            } else {
                                output.ident.clone()
                            },
                        });
                    }
                }
            }
        }

        // Legacy fragment profiles use the inverted screen space.
        if self.shader_target == ShaderTarget::Fragment
            && self.version_in <= InputShaderVersion::Hlsl3
        {
            self.program_flags.set(Flags::HAS_SM3_SCREEN_SPACE);
        }

        self.entry_info = Some(info);
    }

    fn analyze_entry_point_io(
        &mut self,
        info: &mut EntryPointInfo,
        var_decl: &mut VarDecl,
        type_denoter: &TypeDenoter,
        input: bool,
    ) {
        match type_denoter {
            TypeDenoter::Struct(struct_ident) => {
                let struct_ident = struct_ident.clone();
                self.flatten_struct_io(info, &struct_ident, input);
            }
            TypeDenoter::Base(data_type) => {
                match &var_decl.semantic {
                    Some(semantic) => {
                        let mut flags = Flags::default();
                        if semantic.is_system_value() {
                            var_decl.flags.set(Flags::IS_SYSTEM_VALUE);
                            flags.set(Flags::IS_SYSTEM_VALUE);
                        }
                        if input {
                            var_decl.flags.set(Flags::IS_SHADER_INPUT);
                            flags.set(Flags::IS_SHADER_INPUT);
                            info.inputs.push(IoVar {
                                ident: var_decl.ident.clone(),
                                data_type: *data_type,
                                semantic: semantic.clone(),
                                flags,
                            });
                        } else {
                            var_decl.flags.set(Flags::IS_SHADER_OUTPUT);
                            flags.set(Flags::IS_SHADER_OUTPUT);
                            info.outputs.push(IoVar {
                                ident: var_decl.ident.clone(),
                                data_type: *data_type,
                                semantic: semantic.clone(),
                                flags,
                            });
                        }
                    }
                    None => {
                        let message = format!(
                            "missing semantic in parameter '{}' of entry point",
                            var_decl.ident
                        );
                        let area = var_decl.area;
                        self.error(&message, Some(area));
                    }
                }
            }
            other => {
                let message = format!("invalid entry point parameter type '{}'", other);
                let area = var_decl.area;
                self.error(&message, Some(area));
            }
        }
    }

    /// Flattens a structure used as entry-point I/O: every member becomes
    /// one global input or output binding.
    fn flatten_struct_io(&mut self, info: &mut EntryPointInfo, struct_ident: &str, input: bool) {
        let record = match self.structs.get_mut(struct_ident) {
            Some(record) => record,
            None => {
                self.error_undeclared(struct_ident, None);
                return;
            }
        };

        record.flags.set(if input {
            Flags::IS_SHADER_INPUT
        } else {
            Flags::IS_SHADER_OUTPUT
        });

        let members: Vec<StructMember> = record.members.clone();
        let base = record.base.clone();

        for member in members {
            match self.resolve_type_quiet(&member.type_denoter) {
                TypeDenoter::Struct(nested) => {
                    self.flatten_struct_io(info, &nested, input);
                }
                TypeDenoter::Base(data_type) => match &member.semantic {
                    Some(semantic) => {
                        let mut flags = member.flags;
                        flags.set(if input {
                            Flags::IS_SHADER_INPUT
                        } else {
                            Flags::IS_SHADER_OUTPUT
                        });
                        if semantic.is_system_value() {
                            flags.set(Flags::IS_SYSTEM_VALUE);
                        }
                        if let Some(record) = self.structs.get_mut(struct_ident) {
                            if let Some(m) =
                                record.members.iter_mut().find(|m| m.ident == member.ident)
                            {
                                m.flags = flags;
                            }
                        }
                        let io = IoVar {
                            ident: member.ident.clone(),
                            data_type,
                            semantic: semantic.clone(),
                            flags,
                        };
                        if input {
                            info.inputs.push(io);
                        } else {
                            info.outputs.push(io);
                        }
                    }
                    None => {
                        let message = format!(
                            "missing semantic in member '{}' of entry point structure '{}'",
                            member.ident, struct_ident
                        );
                        self.error(&message, None);
                    }
                },
                other => {
                    let message = format!(
                        "invalid entry point structure member type '{}'",
                        other
                    );
                    self.error(&message, None);
                }
            }
        }

        if let Some(base) = base {
            self.flatten_struct_io(info, &base, input);
        }
    }

    /// Vertex-shader position semantics are remapped so the generator can
    /// distinguish them from the fragment coordinate.
    fn analyze_semantic(&mut self, semantic: &mut IndexedSemantic) {
        if semantic.system_value() == Some(SystemValue::Position)
            && self.shader_target == ShaderTarget::Vertex
        {
            semantic.semantic = Semantic::System(SystemValue::VertexPosition);
        }
    }

    /* ----- Sampler states ----- */

    fn analyze_sampler_value(&mut self, value: &SamplerValue, state: &mut SamplerState) {
        let name = value.name.as_str();

        if let ExprKind::Literal(literal) = &value.value.kind {
            let text = literal.value.trim_end_matches(['f', 'F', 'h', 'H']);
            match name {
                "MipLODBias" => state.mip_lod_bias = text.parse().unwrap_or(0.0),
                "MaxAnisotropy" => state.max_anisotropy = text.parse().unwrap_or(1),
                "MinLOD" => state.min_lod = text.parse().unwrap_or(0.0),
                "MaxLOD" => state.max_lod = text.parse().unwrap_or(f32::MAX),
                other => {
                    let area = value.area;
                    self.warning(
                        &format!("unknown sampler state '{}' is ignored", other),
                        Some(area),
                    );
                }
            }
            return;
        }

        if let ExprKind::VarAccess(access) = &value.value.kind {
            let ident = access.var_ident.ident.as_str();
            match name {
                "Filter" => {
                    if let Some(filter) = sampler_filter_from_str(ident) {
                        state.filter = filter;
                    }
                }
                "AddressU" => {
                    if let Some(mode) = address_mode_from_str(ident) {
                        state.address_u = mode;
                    }
                }
                "AddressV" => {
                    if let Some(mode) = address_mode_from_str(ident) {
                        state.address_v = mode;
                    }
                }
                "AddressW" => {
                    if let Some(mode) = address_mode_from_str(ident) {
                        state.address_w = mode;
                    }
                }
                "ComparisonFunc" => {
                    if let Some(func) = comparison_func_from_str(ident) {
                        state.comparison_func = func;
                    }
                }
                other => {
                    let ident = ident.to_string();
                    let area = value.area;
                    self.warning(
                        &format!("unknown sampler state '{}' = '{}' is ignored", other, ident),
                        Some(area),
                    );
                }
            }
            return;
        }

        if name == "BorderColor" {
            let area = value.value.area;
            match self.evaluate_border_color(&value.value) {
                Ok(color) => state.border_color = color,
                Err(message) => self.warning(
                    &format!("{} to initialize sampler value 'BorderColor'", message),
                    Some(area),
                ),
            }
        }
    }

    fn evaluate_border_color(&mut self, expr: &Expr) -> std::result::Result<[f32; 4], String> {
        let eval_float = |expr: &Expr| -> std::result::Result<f32, String> {
            evaluate_const_expr(expr)
                .map(|v| v.to_real() as f32)
                .map_err(|_| "non-constant expression".to_string())
        };

        match &expr.kind {
            ExprKind::Call(call) => {
                let is_vector = call
                    .type_denoter
                    .as_ref()
                    .map(|t| t.is_vector())
                    .unwrap_or(false);
                if is_vector && call.arguments.len() == 4 {
                    let mut color = [0.0f32; 4];
                    for (i, arg) in call.arguments.iter().enumerate() {
                        color[i] = eval_float(arg)?;
                    }
                    Ok(color)
                } else {
                    Err("invalid type or invalid number of arguments".to_string())
                }
            }
            ExprKind::Cast { expr, .. } => {
                let value = eval_float(expr)?;
                Ok([value; 4])
            }
            ExprKind::Initializer(exprs) => {
                if exprs.len() == 4 {
                    let mut color = [0.0f32; 4];
                    for (i, arg) in exprs.iter().enumerate() {
                        color[i] = eval_float(arg)?;
                    }
                    Ok(color)
                } else {
                    Err("invalid number of arguments".to_string())
                }
            }
            _ => Err("invalid expression".to_string()),
        }
    }

    /* ----- Types ----- */

    /// Resolves aliases to their underlying denoter, reporting unknown
    /// names and alias cycles.
    fn resolve_type(&mut self, denoter: &TypeDenoter, area: Option<SourceArea>) -> TypeDenoter {
        let mut visited = Vec::new();
        match self.try_resolve_type(denoter, &mut visited) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.error(&err.to_string(), err.area().or(area));
                denoter.clone()
            }
        }
    }

    /// Like [`resolve_type`] but without reporting (for speculative
    /// queries during type checking).
    fn resolve_type_quiet(&self, denoter: &TypeDenoter) -> TypeDenoter {
        let mut visited = Vec::new();
        self.try_resolve_type(denoter, &mut visited)
            .unwrap_or_else(|_| denoter.clone())
    }

    fn try_resolve_type(
        &self,
        denoter: &TypeDenoter,
        visited: &mut Vec<String>,
    ) -> Result<TypeDenoter> {
        match denoter {
            TypeDenoter::Alias(ident) => {
                if visited.iter().any(|v| v == ident) {
                    return Err(CompilerError::Semantic(
                        format!("circular type alias '{}'", ident),
                        None,
                    ));
                }
                visited.push(ident.clone());

                match self.symtab.fetch_single(ident) {
                    Some(Symbol::AliasType(target)) => {
                        let target = target.clone();
                        self.try_resolve_type(&target, visited)
                    }
                    Some(Symbol::StructType(struct_ident)) => {
                        Ok(TypeDenoter::Struct(struct_ident.clone()))
                    }
                    Some(_) => Err(CompilerError::Semantic(
                        format!("identifier '{}' does not name a type", ident),
                        None,
                    )),
                    None => Err(CompilerError::Semantic(
                        format!("undeclared identifier '{}'", ident),
                        None,
                    )),
                }
            }
            TypeDenoter::Struct(ident) => {
                if self.structs.contains_key(ident) || self.struct_stack.iter().any(|s| s == ident)
                {
                    Ok(denoter.clone())
                } else {
                    Err(CompilerError::Semantic(
                        format!("undeclared identifier 'struct {}'", ident),
                        None,
                    ))
                }
            }
            TypeDenoter::Array(base, dims) => {
                let resolved = self.try_resolve_type(base, visited)?;
                Ok(TypeDenoter::Array(Box::new(resolved), dims.clone()))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_var_type(&mut self, var_type: &mut VarType) {
        let area = var_type.area;
        let resolved = self.resolve_type(&var_type.type_denoter, Some(area));
        // Alias denoters that name structures are normalized in place so
        // the generator sees the structure type.
        if matches!(var_type.type_denoter, TypeDenoter::Alias(_))
            && matches!(resolved, TypeDenoter::Struct(_))
        {
            var_type.type_denoter = resolved;
        }
    }

    fn type_of_expr_reporting(&mut self, expr: &Expr) -> Option<TypeDenoter> {
        match self.type_of_expr(expr) {
            Ok(denoter) => Some(denoter),
            Err(err) => {
                let area = err.area().or(Some(expr.area));
                self.error(&err.to_string(), area);
                None
            }
        }
    }

    /// Computes the type of an expression from decorations and the symbol
    /// table.
    fn type_of_expr(&self, expr: &Expr) -> Result<TypeDenoter> {
        match &expr.kind {
            ExprKind::Null => Ok(TypeDenoter::Void),
            ExprKind::List(first, _) => self.type_of_expr(first),
            ExprKind::Literal(literal) => Ok(TypeDenoter::Base(literal.data_type)),
            ExprKind::TypeName(denoter) => Ok(denoter.clone()),
            ExprKind::Ternary { then_expr, .. } => self.type_of_expr(then_expr),
            ExprKind::Binary { op, lhs, rhs } => {
                if op.is_boolean() {
                    Ok(TypeDenoter::Base(DataType::Scalar(ScalarType::Bool)))
                } else {
                    let lhs_type = self.type_of_expr(lhs)?;
                    let rhs_type = self.type_of_expr(rhs)?;
                    Ok(self.common_type(&lhs_type, &rhs_type))
                }
            }
            ExprKind::Unary { expr, .. } | ExprKind::PostUnary { expr, .. } => {
                self.type_of_expr(expr)
            }
            ExprKind::Call(call) => self.type_of_function_call(call),
            ExprKind::Bracket(inner) => self.type_of_expr(inner),
            ExprKind::Suffix {
                expr: inner,
                var_ident,
            } => {
                let inner_type = self.type_of_expr(inner)?;
                self.type_of_member_chain(&inner_type, var_ident)
            }
            ExprKind::ArrayAccess { expr: inner, indices } => {
                let inner_type = self.resolve_type_quiet(&self.type_of_expr(inner)?);
                Ok(self.index_type(&inner_type, indices.len()))
            }
            ExprKind::Cast { type_denoter, .. } => Ok(type_denoter.clone()),
            ExprKind::VarAccess(access) => self.type_of_var_ident(&access.var_ident),
            ExprKind::Initializer(exprs) => match exprs.first() {
                Some(first) => {
                    let elem = self.type_of_expr(first)?;
                    Ok(TypeDenoter::Array(
                        Box::new(elem),
                        vec![Some(exprs.len() as i64)],
                    ))
                }
                None => Ok(TypeDenoter::Void),
            },
        }
    }

    /// Indexing a base vector or matrix peels a dimension; arrays peel
    /// their array dimensions.
    fn index_type(&self, denoter: &TypeDenoter, num_indices: usize) -> TypeDenoter {
        match denoter {
            TypeDenoter::Array(_, _) => denoter.peel_array(num_indices),
            TypeDenoter::Base(DataType::Matrix(scalar, _, cols)) if num_indices == 1 => {
                TypeDenoter::Base(DataType::Vector(*scalar, *cols))
            }
            TypeDenoter::Base(DataType::Matrix(scalar, _, _)) => {
                TypeDenoter::Base(DataType::Scalar(*scalar))
            }
            TypeDenoter::Base(DataType::Vector(scalar, _)) => {
                TypeDenoter::Base(DataType::Scalar(*scalar))
            }
            other => other.clone(),
        }
    }

    fn type_of_var_ident(&self, var_ident: &VarIdent) -> Result<TypeDenoter> {
        let symbol = self.symtab.fetch_single(&var_ident.ident).ok_or_else(|| {
            CompilerError::Semantic(
                format!("undeclared identifier '{}'", var_ident.ident),
                Some(var_ident.area),
            )
        })?;

        let base = match symbol {
            Symbol::Var(var) => var.type_denoter.clone(),
            Symbol::Texture(texture) => TypeDenoter::Texture(texture.texture_type),
            Symbol::Sampler => TypeDenoter::Sampler,
            Symbol::StructType(ident) => TypeDenoter::Struct(ident.clone()),
            Symbol::AliasType(denoter) => denoter.clone(),
            Symbol::Func(_) => {
                return Err(CompilerError::Semantic(
                    format!("function '{}' used as value", var_ident.ident),
                    Some(var_ident.area),
                ))
            }
        };

        let peeled = base.peel_array(var_ident.array_indices.len());
        match &var_ident.next {
            Some(next) => self.type_of_member_chain(&peeled, next),
            None => Ok(peeled),
        }
    }

    fn type_of_member_chain(
        &self,
        base: &TypeDenoter,
        var_ident: &VarIdent,
    ) -> Result<TypeDenoter> {
        let resolved = self.resolve_type_quiet(base);
        let member_type = match &resolved {
            TypeDenoter::Struct(struct_ident) => self
                .fetch_from_struct(struct_ident, &var_ident.ident)
                .ok_or_else(|| {
                    CompilerError::Semantic(
                        format!(
                            "identifier '{}' is not a member of 'struct {}'",
                            var_ident.ident, struct_ident
                        ),
                        Some(var_ident.area),
                    )
                })?,
            TypeDenoter::Base(data_type) => {
                let scalar = data_type.scalar_type().ok_or_else(|| {
                    CompilerError::Semantic(
                        format!("invalid subscript '{}'", var_ident.ident),
                        Some(var_ident.area),
                    )
                })?;
                let len = var_ident.ident.chars().count();
                if (1..=4).contains(&len) {
                    if len == 1 {
                        TypeDenoter::Base(DataType::Scalar(scalar))
                    } else {
                        TypeDenoter::Base(DataType::Vector(scalar, len as u8))
                    }
                } else {
                    return Err(CompilerError::Semantic(
                        format!("invalid subscript '{}'", var_ident.ident),
                        Some(var_ident.area),
                    ));
                }
            }
            other => {
                return Err(CompilerError::Semantic(
                    format!("invalid member access for type '{}'", other),
                    Some(var_ident.area),
                ))
            }
        };

        let peeled = member_type.peel_array(var_ident.array_indices.len());
        match &var_ident.next {
            Some(next) => self.type_of_member_chain(&peeled, next),
            None => Ok(peeled),
        }
    }

    fn type_of_function_call(&self, call: &FunctionCall) -> Result<TypeDenoter> {
        if let Some(denoter) = &call.type_denoter {
            return Ok(denoter.clone());
        }

        if let Some(intrinsic) = call.intrinsic {
            return Ok(self.intrinsic_return_type(intrinsic, call));
        }

        let ident = match call.var_ident.as_ref() {
            Some(var_ident) if var_ident.next.is_none() => &var_ident.ident,
            // Texture method calls and friends default to float4.
            _ => {
                return Ok(TypeDenoter::Base(DataType::Vector(ScalarType::Float, 4)));
            }
        };

        match self.symtab.fetch(ident) {
            Some(symbols) => {
                for symbol in symbols {
                    if let Symbol::Func(sig) = symbol {
                        if sig.params.len() == call.arguments.len() {
                            return Ok(sig.return_type.clone());
                        }
                    }
                }
                for symbol in symbols {
                    if let Symbol::Func(sig) = symbol {
                        return Ok(sig.return_type.clone());
                    }
                }
                Err(CompilerError::Semantic(
                    format!("identifier '{}' does not name a function", ident),
                    Some(call.area),
                ))
            }
            None => Err(CompilerError::Semantic(
                format!("undeclared identifier '{}'", ident),
                Some(call.area),
            )),
        }
    }

    fn intrinsic_return_type(&self, intrinsic: Intrinsic, call: &FunctionCall) -> TypeDenoter {
        use Intrinsic as I;

        let float = TypeDenoter::Base(DataType::Scalar(ScalarType::Float));
        let float4 = TypeDenoter::Base(DataType::Vector(ScalarType::Float, 4));
        let bool_ty = TypeDenoter::Base(DataType::Scalar(ScalarType::Bool));

        let first_arg_type = || {
            call.arguments
                .first()
                .and_then(|arg| self.type_of_expr(arg).ok())
                .map(|t| self.resolve_type_quiet(&t))
                .unwrap_or_else(|| float.clone())
        };

        match intrinsic {
            I::Dot | I::Distance | I::Length | I::Determinant => float,
            I::All | I::Any | I::IsInf | I::IsNaN => bool_ty,
            I::Clip
            | I::GroupMemoryBarrier
            | I::GroupMemoryBarrierWithGroupSync
            | I::DeviceMemoryBarrier
            | I::DeviceMemoryBarrierWithGroupSync
            | I::AllMemoryBarrier
            | I::AllMemoryBarrierWithGroupSync => TypeDenoter::Void,
            I::Tex1D2 | I::Tex1D4 | I::Tex2D2 | I::Tex2D4 | I::Tex3D2 | I::Tex3D4
            | I::TexCube2 | I::TexCube4 => float4,
            _ if intrinsic.is_texture_method() => float4,
            I::Mul => {
                // mul(a, b): matrix * vector yields the vector shape.
                let lhs = first_arg_type();
                let rhs = call
                    .arguments
                    .get(1)
                    .and_then(|arg| self.type_of_expr(arg).ok())
                    .map(|t| self.resolve_type_quiet(&t))
                    .unwrap_or_else(|| float.clone());
                match (&lhs, &rhs) {
                    (TypeDenoter::Base(DataType::Matrix(s, rows, _)), TypeDenoter::Base(DataType::Vector(_, _))) => {
                        TypeDenoter::Base(DataType::Vector(*s, *rows))
                    }
                    (TypeDenoter::Base(DataType::Vector(s, _)), TypeDenoter::Base(DataType::Matrix(_, _, cols))) => {
                        TypeDenoter::Base(DataType::Vector(*s, *cols))
                    }
                    _ => self.common_type(&lhs, &rhs),
                }
            }
            I::Transpose => match first_arg_type() {
                TypeDenoter::Base(DataType::Matrix(s, rows, cols)) => {
                    TypeDenoter::Base(DataType::Matrix(s, cols, rows))
                }
                other => other,
            },
            I::Cross => first_arg_type(),
            _ => first_arg_type(),
        }
    }

    fn common_type(&self, lhs: &TypeDenoter, rhs: &TypeDenoter) -> TypeDenoter {
        let lhs = self.resolve_type_quiet(lhs);
        let rhs = self.resolve_type_quiet(rhs);
        if lhs == rhs {
            return lhs;
        }
        match (&lhs, &rhs) {
            (TypeDenoter::Base(a), TypeDenoter::Base(b)) => {
                // Prefer the shape with more components, then the wider
                // scalar kind.
                if a.num_components() != b.num_components() {
                    if a.num_components() > b.num_components() {
                        lhs
                    } else {
                        rhs
                    }
                } else {
                    let rank = |s: ScalarType| match s {
                        ScalarType::Bool => 0,
                        ScalarType::Int => 1,
                        ScalarType::UInt => 2,
                        ScalarType::Half => 3,
                        ScalarType::Float => 4,
                        ScalarType::Double => 5,
                    };
                    let a_rank = a.scalar_type().map(rank).unwrap_or(0);
                    let b_rank = b.scalar_type().map(rank).unwrap_or(0);
                    if a_rank >= b_rank {
                        lhs
                    } else {
                        rhs
                    }
                }
            }
            _ => lhs,
        }
    }

    /* ----- Cast validation ----- */

    fn validate_type_cast_from_expr(
        &mut self,
        source: &Expr,
        dest: &TypeDenoter,
        area: SourceArea,
    ) {
        // Initializer lists are validated per element elsewhere.
        if matches!(source.kind, ExprKind::Initializer(_)) {
            return;
        }
        let area = if source.area.is_valid() { source.area } else { area };
        if let Ok(src) = self.type_of_expr(source) {
            self.validate_type_cast(&src, dest, false, area);
        }
    }

    fn validate_type_cast(
        &mut self,
        source: &TypeDenoter,
        dest: &TypeDenoter,
        explicit: bool,
        area: SourceArea,
    ) {
        if !self.can_cast(source, dest, explicit) {
            let message = format!(
                "can not cast from '{}' to '{}'",
                self.resolve_type_quiet(source),
                self.resolve_type_quiet(dest)
            );
            self.reports.submit(
                crate::report::Severity::Error,
                &message,
                Some(area),
                Some("invalid-cast"),
            );
        }
    }

    fn can_cast(&self, source: &TypeDenoter, dest: &TypeDenoter, explicit: bool) -> bool {
        let src = self.resolve_type_quiet(source);
        let dst = self.resolve_type_quiet(dest);

        if src == dst {
            return true;
        }

        match (&src, &dst) {
            (TypeDenoter::Base(a), TypeDenoter::Base(b)) => {
                if matches!(a, DataType::String) || matches!(b, DataType::String) {
                    return false;
                }
                if explicit {
                    return true;
                }
                // Implicit conversions keep the shape or splat a scalar;
                // vectors may also narrow to scalars.
                a.num_components() == b.num_components()
                    || a.is_scalar()
                    || b.is_scalar()
            }
            (TypeDenoter::Struct(a), TypeDenoter::Struct(b)) => a == b,
            (TypeDenoter::Array(a, dims_a), TypeDenoter::Array(b, dims_b)) => {
                dims_a == dims_b && self.can_cast(a, b, explicit)
            }
            // Textures and samplers never participate in casts.
            _ => false,
        }
    }

    /* ----- Post passes ----- */

    /// Copies analysis flags from struct records back onto the AST
    /// declarations, so the generator sees shader I/O structures.
    fn backfill_struct_flags(&mut self, stmts: &mut [Stmt]) {
        for stmt in stmts {
            let struct_decl = match &mut stmt.kind {
                StmtKind::StructDecl(decl) => Some(&mut decl.struct_decl),
                StmtKind::VarDecl(decl) => decl.var_type.struct_decl.as_mut(),
                StmtKind::AliasDecl(decl) => decl.struct_decl.as_mut(),
                StmtKind::FunctionDecl(decl) => decl.return_type.struct_decl.as_mut(),
                _ => None,
            };
            if let Some(decl) = struct_decl {
                if let Some(record) = self.structs.get(&decl.ident) {
                    decl.flags.0 |= record.flags.0;
                    for member_stmt in &mut decl.members {
                        for var_decl in &mut member_stmt.var_decls {
                            if let Some(member) =
                                record.members.iter().find(|m| m.ident == var_decl.ident)
                            {
                                var_decl.flags.0 |= member.flags.0;
                            }
                        }
                    }
                }
            }
        }
    }
}

/* ----- Sampler state value tables ----- */

fn sampler_filter_from_str(value: &str) -> Option<SamplerFilter> {
    use SamplerFilter as T;
    let filter = match value {
        "MIN_MAG_MIP_POINT" => T::MinMagMipPoint,
        "MIN_MAG_POINT_MIP_LINEAR" => T::MinMagPointMipLinear,
        "MIN_POINT_MAG_LINEAR_MIP_POINT" => T::MinPointMagLinearMipPoint,
        "MIN_POINT_MAG_MIP_LINEAR" => T::MinPointMagMipLinear,
        "MIN_LINEAR_MAG_MIP_POINT" => T::MinLinearMagMipPoint,
        "MIN_LINEAR_MAG_POINT_MIP_LINEAR" => T::MinLinearMagPointMipLinear,
        "MIN_MAG_LINEAR_MIP_POINT" => T::MinMagLinearMipPoint,
        "MIN_MAG_MIP_LINEAR" => T::MinMagMipLinear,
        "ANISOTROPIC" => T::Anisotropic,
        "COMPARISON_MIN_MAG_MIP_POINT" => T::ComparisonMinMagMipPoint,
        "COMPARISON_MIN_MAG_POINT_MIP_LINEAR" => T::ComparisonMinMagPointMipLinear,
        "COMPARISON_MIN_POINT_MAG_LINEAR_MIP_POINT" => T::ComparisonMinPointMagLinearMipPoint,
        "COMPARISON_MIN_POINT_MAG_MIP_LINEAR" => T::ComparisonMinPointMagMipLinear,
        "COMPARISON_MIN_LINEAR_MAG_MIP_POINT" => T::ComparisonMinLinearMagMipPoint,
        "COMPARISON_MIN_LINEAR_MAG_POINT_MIP_LINEAR" => T::ComparisonMinLinearMagPointMipLinear,
        "COMPARISON_MIN_MAG_LINEAR_MIP_POINT" => T::ComparisonMinMagLinearMipPoint,
        "COMPARISON_MIN_MAG_MIP_LINEAR" => T::ComparisonMinMagMipLinear,
        "COMPARISON_ANISOTROPIC" => T::ComparisonAnisotropic,
        "MINIMUM_MIN_MAG_MIP_POINT" => T::MinimumMinMagMipPoint,
        "MINIMUM_MIN_MAG_POINT_MIP_LINEAR" => T::MinimumMinMagPointMipLinear,
        "MINIMUM_MIN_POINT_MAG_LINEAR_MIP_POINT" => T::MinimumMinPointMagLinearMipPoint,
        "MINIMUM_MIN_POINT_MAG_MIP_LINEAR" => T::MinimumMinPointMagMipLinear,
        "MINIMUM_MIN_LINEAR_MAG_MIP_POINT" => T::MinimumMinLinearMagMipPoint,
        "MINIMUM_MIN_LINEAR_MAG_POINT_MIP_LINEAR" => T::MinimumMinLinearMagPointMipLinear,
        "MINIMUM_MIN_MAG_LINEAR_MIP_POINT" => T::MinimumMinMagLinearMipPoint,
        "MINIMUM_MIN_MAG_MIP_LINEAR" => T::MinimumMinMagMipLinear,
        "MINIMUM_ANISOTROPIC" => T::MinimumAnisotropic,
        "MAXIMUM_MIN_MAG_MIP_POINT" => T::MaximumMinMagMipPoint,
        "MAXIMUM_MIN_MAG_POINT_MIP_LINEAR" => T::MaximumMinMagPointMipLinear,
        "MAXIMUM_MIN_POINT_MAG_LINEAR_MIP_POINT" => T::MaximumMinPointMagLinearMipPoint,
        "MAXIMUM_MIN_POINT_MAG_MIP_LINEAR" => T::MaximumMinPointMagMipLinear,
        "MAXIMUM_MIN_LINEAR_MAG_MIP_POINT" => T::MaximumMinLinearMagMipPoint,
        "MAXIMUM_MIN_LINEAR_MAG_POINT_MIP_LINEAR" => T::MaximumMinLinearMagPointMipLinear,
        "MAXIMUM_MIN_MAG_LINEAR_MIP_POINT" => T::MaximumMinMagLinearMipPoint,
        "MAXIMUM_MIN_MAG_MIP_LINEAR" => T::MaximumMinMagMipLinear,
        "MAXIMUM_ANISOTROPIC" => T::MaximumAnisotropic,
        _ => return None,
    };
    Some(filter)
}

fn address_mode_from_str(value: &str) -> Option<TextureAddressMode> {
    use TextureAddressMode as T;
    let mode = match value {
        "WRAP" => T::Wrap,
        "MIRROR" => T::Mirror,
        "CLAMP" => T::Clamp,
        "BORDER" => T::Border,
        "MIRROR_ONCE" => T::MirrorOnce,
        _ => return None,
    };
    Some(mode)
}

fn comparison_func_from_str(value: &str) -> Option<ComparisonFunc> {
    use ComparisonFunc as T;
    let func = match value {
        "COMPARISON_NEVER" => T::Never,
        "COMPARISON_LESS" => T::Less,
        "COMPARISON_EQUAL" => T::Equal,
        "COMPARISON_LESS_EQUAL" => T::LessEqual,
        "COMPARISON_GREATER" => T::Greater,
        "COMPARISON_NOT_EQUAL" => T::NotEqual,
        "COMPARISON_GREATER_EQUAL" => T::GreaterEqual,
        "COMPARISON_ALWAYS" => T::Always,
        _ => return None,
    };
    Some(func)
}

/// Marks the terminal `return` of a function body, so the generator can
/// suppress a redundant `return;` on void entry points.
fn mark_end_of_function(block: &mut CodeBlock) {
    if let Some(last) = block.stmts.last_mut() {
        match &mut last.kind {
            StmtKind::Return(_) => last.flags.set(Flags::IS_END_OF_FUNCTION),
            StmtKind::CodeBlock(inner) => mark_end_of_function(inner),
            StmtKind::If {
                body, else_stmt, ..
            } => {
                if let StmtKind::CodeBlock(inner) = &mut body.kind {
                    mark_end_of_function(inner);
                } else if let StmtKind::Return(_) = &mut body.kind {
                    body.flags.set(Flags::IS_END_OF_FUNCTION);
                }
                if let Some(else_stmt) = else_stmt {
                    if let StmtKind::CodeBlock(inner) = &mut else_stmt.body.kind {
                        mark_end_of_function(inner);
                    } else if let StmtKind::Return(_) = &mut else_stmt.body.kind {
                        else_stmt.body.flags.set(Flags::IS_END_OF_FUNCTION);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Clears code generation for local declarations of output-aliasing
/// variables.
fn disable_var_codegen(block: &mut CodeBlock, disabled: &HashSet<String>) {
    for stmt in &mut block.stmts {
        match &mut stmt.kind {
            StmtKind::VarDecl(decl) => {
                for var_decl in &mut decl.var_decls {
                    if disabled.contains(&var_decl.ident) {
                        var_decl.flags.set(Flags::DISABLE_CODEGEN);
                    }
                }
            }
            StmtKind::CodeBlock(inner) => disable_var_codegen(inner, disabled),
            StmtKind::If {
                body, else_stmt, ..
            } => {
                if let StmtKind::CodeBlock(inner) = &mut body.kind {
                    disable_var_codegen(inner, disabled);
                }
                if let Some(else_stmt) = else_stmt {
                    if let StmtKind::CodeBlock(inner) = &mut else_stmt.body.kind {
                        disable_var_codegen(inner, disabled);
                    }
                }
            }
            StmtKind::For { body, .. }
            | StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. } => {
                if let StmtKind::CodeBlock(inner) = &mut body.kind {
                    disable_var_codegen(inner, disabled);
                }
            }
            _ => {}
        }
    }
}
