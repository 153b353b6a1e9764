//! GLSL code emission.
//!
//! Walks the decorated and lowered AST, writing target source through the
//! code writer: flattened entry-point interface declarations, uniforms,
//! structures, helper functions, intrinsic mapping and the synthesized
//! `main` function.

use crate::ast::*;
use crate::error::{CompilerError, Result};
use crate::glsl::keywords::{data_type_to_glsl, semantic_to_glsl, texture_type_to_glsl};
use crate::intrinsics::Intrinsic;
use crate::report::ReportHandler;
use crate::ty::{DataType, TypeDenoter, UniformBufferType};
use crate::writer::{CodeWriter, WriterOptions};
use crate::{Options, OutputShaderVersion, ShaderTarget};
use log::debug;
use std::collections::{HashMap, HashSet};

struct StructInfo {
    members: Vec<(String, TypeDenoter, Option<IndexedSemantic>)>,
    flags: Flags,
}

pub struct GlslGenerator<'a, 'l> {
    writer: CodeWriter,
    reports: &'a mut ReportHandler<'l>,
    target: ShaderTarget,
    version: OutputShaderVersion,
    options: Options,
    entry: EntryPointInfo,
    program_flags: Flags,
    /// Global type aliases for on-the-fly resolution.
    aliases: HashMap<String, TypeDenoter>,
    structs: HashMap<String, StructInfo>,
    /// Storage-buffer object names (indexed with `[]` instead of sampled).
    storage_buffers: HashSet<String>,
    /// Entry-point parameters of structure type: parameter name -> struct.
    param_structs: HashMap<String, String>,
    /// Entry-point scalar/vector parameters bound to GLSL built-ins.
    param_builtins: HashMap<String, String>,
    /// Intrinsics that require a helper function definition.
    wrappers: HashSet<Intrinsic>,
    inside_entry_point: bool,
}

pub fn generate(
    program: &Program,
    target: ShaderTarget,
    version: OutputShaderVersion,
    options: &Options,
    reports: &mut ReportHandler<'_>,
) -> Result<String> {
    let entry = program.entry_point.clone().ok_or_else(|| {
        CompilerError::Internal("program has no entry point information".to_string())
    })?;

    let mut writer = CodeWriter::new(&options.indent);
    writer.push_options(WriterOptions {
        enable_indent: options.enable_indent,
        enable_new_line: options.enable_new_line,
    });

    let mut generator = GlslGenerator {
        writer,
        reports,
        target,
        version,
        options: options.clone(),
        entry,
        program_flags: program.flags,
        aliases: HashMap::new(),
        structs: HashMap::new(),
        storage_buffers: HashSet::new(),
        param_structs: HashMap::new(),
        param_builtins: HashMap::new(),
        wrappers: HashSet::new(),
        inside_entry_point: false,
    };

    generator.collect_program_info(program);
    generator.write_program(program)?;
    Ok(generator.writer.into_output())
}

impl<'a, 'l> GlslGenerator<'a, 'l> {
    /* ----- Pre-scan ----- */

    fn collect_program_info(&mut self, program: &Program) {
        for stmt in &program.global_stmts {
            match &stmt.kind {
                StmtKind::AliasDecl(decl) => {
                    if let Some(struct_decl) = &decl.struct_decl {
                        self.collect_struct(struct_decl);
                    }
                    for alias in &decl.alias_decls {
                        self.aliases
                            .insert(alias.ident.clone(), alias.type_denoter.clone());
                    }
                }
                StmtKind::StructDecl(decl) => self.collect_struct(&decl.struct_decl),
                StmtKind::VarDecl(decl) => {
                    if let Some(struct_decl) = &decl.var_type.struct_decl {
                        self.collect_struct(struct_decl);
                    }
                }
                StmtKind::TextureDecl(decl) => {
                    if decl.texture_type.is_storage() {
                        for texture in &decl.texture_decls {
                            self.storage_buffers.insert(texture.ident.clone());
                        }
                    }
                }
                StmtKind::FunctionDecl(decl) => {
                    if let Some(struct_decl) = &decl.return_type.struct_decl {
                        self.collect_struct(struct_decl);
                    }
                    if decl.flags.has(Flags::IS_ENTRY_POINT) {
                        self.collect_entry_point_params(decl);
                    }
                    self.scan_wrappers_in_function(decl);
                }
                _ => {}
            }
        }
    }

    fn collect_struct(&mut self, decl: &StructDecl) {
        let mut members = Vec::new();
        for member_stmt in &decl.members {
            if let Some(nested) = &member_stmt.var_type.struct_decl {
                self.collect_struct(nested);
            }
            for var_decl in &member_stmt.var_decls {
                members.push((
                    var_decl.ident.clone(),
                    member_stmt.var_type.type_denoter.clone(),
                    var_decl.semantic.clone(),
                ));
            }
        }
        self.structs.insert(
            decl.ident.clone(),
            StructInfo {
                members,
                flags: decl.flags,
            },
        );
    }

    fn collect_entry_point_params(&mut self, decl: &FunctionDecl) {
        for param in &decl.parameters {
            let var_decl = match param.var_decls.first() {
                Some(var_decl) => var_decl,
                None => continue,
            };
            match self.resolve_alias(&param.var_type.type_denoter) {
                TypeDenoter::Struct(struct_ident) => {
                    self.param_structs
                        .insert(var_decl.ident.clone(), struct_ident);
                }
                TypeDenoter::Base(_) => {
                    if let Some(semantic) = &var_decl.semantic {
                        if let Some(builtin) =
                            semantic_to_glsl(semantic, self.target, param.is_output())
                        {
                            self.param_builtins.insert(var_decl.ident.clone(), builtin);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn scan_wrappers_in_function(&mut self, decl: &FunctionDecl) {
        fn scan_stmt(generator: &mut GlslGenerator<'_, '_>, stmt: &Stmt) {
            match &stmt.kind {
                StmtKind::CodeBlock(block) => {
                    for stmt in &block.stmts {
                        scan_stmt(generator, stmt);
                    }
                }
                StmtKind::For { init, body, .. } => {
                    scan_stmt(generator, init);
                    scan_stmt(generator, body);
                }
                StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                    scan_stmt(generator, body)
                }
                StmtKind::If {
                    body, else_stmt, ..
                } => {
                    scan_stmt(generator, body);
                    if let Some(else_stmt) = else_stmt {
                        scan_stmt(generator, &else_stmt.body);
                    }
                }
                StmtKind::Switch { cases, .. } => {
                    for case in cases {
                        for stmt in &case.stmts {
                            scan_stmt(generator, stmt);
                        }
                    }
                }
                StmtKind::Expr(expr) => scan_expr(generator, expr),
                StmtKind::Return(Some(expr)) => scan_expr(generator, expr),
                _ => {}
            }
        }

        fn scan_expr(generator: &mut GlslGenerator<'_, '_>, expr: &Expr) {
            match &expr.kind {
                ExprKind::Call(call) => {
                    if call.intrinsic == Some(Intrinsic::Clip)
                        && !call.flags.has(Flags::CAN_INLINE_INTRINSIC_WRAPPER)
                    {
                        generator.wrappers.insert(Intrinsic::Clip);
                    }
                    for arg in &call.arguments {
                        scan_expr(generator, arg);
                    }
                }
                ExprKind::List(a, b) | ExprKind::Binary { lhs: a, rhs: b, .. } => {
                    scan_expr(generator, a);
                    scan_expr(generator, b);
                }
                ExprKind::Ternary {
                    condition,
                    then_expr,
                    else_expr,
                } => {
                    scan_expr(generator, condition);
                    scan_expr(generator, then_expr);
                    scan_expr(generator, else_expr);
                }
                ExprKind::Unary { expr, .. }
                | ExprKind::PostUnary { expr, .. }
                | ExprKind::Bracket(expr)
                | ExprKind::Cast { expr, .. }
                | ExprKind::Suffix { expr, .. } => scan_expr(generator, expr),
                ExprKind::ArrayAccess { expr, indices } => {
                    scan_expr(generator, expr);
                    for index in indices {
                        scan_expr(generator, index);
                    }
                }
                ExprKind::VarAccess(access) => {
                    if let Some(assign_expr) = &access.assign_expr {
                        scan_expr(generator, assign_expr);
                    }
                }
                ExprKind::Initializer(exprs) => {
                    for expr in exprs {
                        scan_expr(generator, expr);
                    }
                }
                _ => {}
            }
        }

        if let Some(block) = &decl.code_block {
            for stmt in &block.stmts {
                scan_stmt(self, stmt);
            }
        }
    }

    fn resolve_alias(&self, denoter: &TypeDenoter) -> TypeDenoter {
        let mut current = denoter.clone();
        let mut guard = 0;
        while let TypeDenoter::Alias(ident) = &current {
            if self.structs.contains_key(ident) {
                return TypeDenoter::Struct(ident.clone());
            }
            match self.aliases.get(ident) {
                Some(target) => current = target.clone(),
                None => break,
            }
            guard += 1;
            if guard > 64 {
                break;
            }
        }
        current
    }

    /* ----- Program emission ----- */

    fn write_program(&mut self, program: &Program) -> Result<()> {
        self.write_version_directive();
        self.write_compute_layout();
        self.write_interface();

        for stmt in &program.global_stmts {
            if stmt.flags.has(Flags::DISABLE_CODEGEN) {
                continue;
            }
            self.write_global_stmt(stmt)?;
        }

        Ok(())
    }

    fn write_version_directive(&mut self) {
        if let Some(number) = self.version.version_number() {
            self.writer.write_line(&format!("#version {}", number));
            self.writer.blank_line();
        }
        if self.program_flags.has(Flags::IS_FRAG_COORD_USED) {
            // Fragment position inputs surface as the gl_FragCoord built-in
            // instead of a user varying.
            debug!("fragment coordinate is read through gl_FragCoord");
        }
        if self.program_flags.has(Flags::HAS_SM3_SCREEN_SPACE) {
            // Shader model 3 fragment positions use the inverted screen
            // space; the host application compensates when binding.
            debug!("legacy shader model 3 screen space is active");
        }
    }

    fn write_compute_layout(&mut self) {
        if self.target != ShaderTarget::Compute {
            return;
        }
        let [x, y, z] = self.entry.num_threads.unwrap_or([1, 1, 1]);
        self.writer.write_line(&format!(
            "layout(local_size_x = {}, local_size_y = {}, local_size_z = {}) in;",
            x, y, z
        ));
        self.writer.blank_line();
    }

    /// Emits the flattened entry-point interface: one `in`/`out` per
    /// non-built-in binding.
    fn write_interface(&mut self) {
        let inputs = self.entry.inputs.clone();
        let outputs = self.entry.outputs.clone();
        let mut wrote_any = false;

        for io in &inputs {
            if semantic_to_glsl(&io.semantic, self.target, false).is_some() {
                continue;
            }
            if let Some(keyword) = data_type_to_glsl(io.data_type) {
                let name = self.io_var_name(io, false);
                self.writer.write_line(&format!("in {} {};", keyword, name));
                wrote_any = true;
            }
        }

        for io in &outputs {
            if semantic_to_glsl(&io.semantic, self.target, true).is_some() {
                continue;
            }
            if let Some(keyword) = data_type_to_glsl(io.data_type) {
                let name = self.io_var_name(io, true);
                self.writer
                    .write_line(&format!("out {} {};", keyword, name));
                wrote_any = true;
            }
        }

        if wrote_any {
            self.writer.blank_line();
        }
    }

    fn io_var_name(&self, io: &IoVar, output: bool) -> String {
        if !io.ident.is_empty() {
            return io.ident.clone();
        }
        let direction = if output { "output" } else { "input" };
        format!(
            "{}{}{}",
            self.options.name_mangling_prefix, direction, io.semantic.index
        )
    }

    /// Output variable or built-in a semantic writes to.
    fn output_name_for_semantic(&self, semantic: &IndexedSemantic) -> Option<String> {
        if let Some(builtin) = semantic_to_glsl(semantic, self.target, true) {
            return Some(builtin);
        }
        self.entry
            .outputs
            .iter()
            .find(|io| io.semantic == *semantic)
            .map(|io| self.io_var_name(io, true))
    }

    /* ----- Global statements ----- */

    fn write_global_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        self.write_stmt_comment(stmt);
        match &stmt.kind {
            StmtKind::FunctionDecl(decl) => self.write_function_decl(decl),
            StmtKind::BufferDecl(decl) => self.write_uniform_buffer(decl),
            StmtKind::TextureDecl(decl) => self.write_texture_decl(decl),
            StmtKind::SamplerDecl(decl) => self.write_sampler_decl(decl),
            StmtKind::StructDecl(decl) => self.write_struct_decl_stmt(&decl.struct_decl),
            StmtKind::VarDecl(decl) => self.write_global_var_decl(decl),
            // Type aliases are resolved inline and emit nothing.
            StmtKind::AliasDecl(_) | StmtKind::Null => Ok(()),
            _ => Ok(()),
        }
    }

    fn write_stmt_comment(&mut self, stmt: &Stmt) {
        if !self.options.comments {
            return;
        }
        if let Some(comment) = &stmt.comment {
            for line in comment.lines() {
                self.writer.write_line(&format!("// {}", line));
            }
        }
    }

    fn write_uniform_buffer(&mut self, decl: &BufferDeclStmt) -> Result<()> {
        if decl.buffer_type == UniformBufferType::TextureBuffer {
            debug!("tbuffer '{}' is emitted as a uniform block", decl.ident);
        }

        if self.version.supports_uniform_blocks() {
            self.writer
                .write_line(&format!("layout(std140) uniform {}", decl.ident));
            self.writer.write_line("{");
            self.writer.push_indent();
            for member in &decl.members {
                self.write_var_decl_stmt_line(member)?;
            }
            self.writer.pop_indent();
            self.writer.write_line("};");
        } else {
            // GLSL 1.30 has no uniform blocks; members become plain
            // uniforms.
            for member in &decl.members {
                let keyword = self.type_to_glsl(&member.var_type.type_denoter)?;
                for var_decl in &member.var_decls {
                    if var_decl.flags.has(Flags::DISABLE_CODEGEN) {
                        continue;
                    }
                    let dims = self.array_dims_to_glsl(&var_decl.array_dims);
                    self.writer.write_line(&format!(
                        "uniform {} {}{};",
                        keyword, var_decl.ident, dims
                    ));
                }
            }
        }
        self.writer.blank_line();
        Ok(())
    }

    fn write_texture_decl(&mut self, stmt: &TextureDeclStmt) -> Result<()> {
        for decl in &stmt.texture_decls {
            if stmt.texture_type.is_storage() {
                self.write_storage_buffer(stmt, decl)?;
                continue;
            }

            let keyword = texture_type_to_glsl(stmt.texture_type).ok_or_else(|| {
                CompilerError::CodeGen(
                    "texture type has no GLSL counterpart".to_string(),
                    Some(decl.area),
                )
            })?;

            let binding = decl
                .slot_registers
                .iter()
                .find(|r| r.register_type == RegisterType::Texture)
                .or_else(|| decl.slot_registers.first())
                .map(|r| r.slot);

            if self.version.supports_explicit_bindings() {
                if let Some(slot) = binding {
                    self.writer.write_line(&format!(
                        "layout(binding = {}) uniform {} {};",
                        slot, keyword, decl.ident
                    ));
                    continue;
                }
            }
            self.writer
                .write_line(&format!("uniform {} {};", keyword, decl.ident));
        }
        self.writer.blank_line();
        Ok(())
    }

    fn write_storage_buffer(&mut self, stmt: &TextureDeclStmt, decl: &TextureDecl) -> Result<()> {
        let element = stmt
            .color_type
            .and_then(data_type_to_glsl)
            .unwrap_or_else(|| "vec4".to_string());

        let binding = decl.slot_registers.first().map(|r| r.slot).unwrap_or(0);

        self.writer.write_line(&format!(
            "layout(std430, binding = {}) buffer {}{}",
            binding, self.options.name_mangling_prefix, decl.ident
        ));
        self.writer.write_line("{");
        self.writer.push_indent();
        self.writer
            .write_line(&format!("{} {}[];", element, decl.ident));
        self.writer.pop_indent();
        self.writer.write_line("};");
        self.writer.blank_line();
        Ok(())
    }

    fn write_sampler_decl(&mut self, stmt: &SamplerDeclStmt) -> Result<()> {
        // D3D10+ sampler state objects are folded into combined samplers.
        if !stmt.sampler_type.starts_with("sampler")
            || stmt.sampler_type == "sampler_state"
        {
            return Ok(());
        }

        let keyword = match stmt.sampler_type.as_str() {
            "sampler1D" => "sampler1D",
            "sampler3D" => "sampler3D",
            "samplerCUBE" => "samplerCube",
            _ => "sampler2D",
        };

        for decl in &stmt.sampler_decls {
            self.writer
                .write_line(&format!("uniform {} {};", keyword, decl.ident));
        }
        self.writer.blank_line();
        Ok(())
    }

    fn write_struct_decl_stmt(&mut self, decl: &StructDecl) -> Result<()> {
        // Shader I/O structures were flattened into the global interface.
        if decl.flags.has(Flags::IS_SHADER_INPUT) || decl.flags.has(Flags::IS_SHADER_OUTPUT) {
            return Ok(());
        }
        self.write_struct_decl(decl)?;
        self.writer.write_line("};");
        self.writer.blank_line();
        Ok(())
    }

    fn write_struct_decl(&mut self, decl: &StructDecl) -> Result<()> {
        self.writer.write_line(&format!("struct {}", decl.ident));
        self.writer.write_line("{");
        self.writer.push_indent();
        for member in &decl.members {
            self.write_var_decl_stmt_line(member)?;
        }
        self.writer.pop_indent();
        Ok(())
    }

    fn write_global_var_decl(&mut self, decl: &VarDeclStmt) -> Result<()> {
        let is_static = decl
            .storage_classes
            .iter()
            .any(|sc| matches!(sc, StorageClass::Static));
        let is_const = decl.is_const();

        let keyword = self.type_to_glsl(&decl.var_type.type_denoter)?;

        for var_decl in &decl.var_decls {
            if var_decl.flags.has(Flags::DISABLE_CODEGEN) {
                continue;
            }
            let dims = self.array_dims_to_glsl(&var_decl.array_dims);
            self.writer.begin_line();
            if (is_static || is_const) && var_decl.initializer.is_some() {
                self.writer.write("const ");
            } else {
                // HLSL globals are implicit uniforms.
                self.writer.write("uniform ");
            }
            self.writer
                .write(&format!("{} {}{}", keyword, var_decl.ident, dims));
            if let Some(initializer) = &var_decl.initializer {
                self.writer.write(" = ");
                self.write_expr(initializer)?;
            }
            self.writer.write(";");
            self.writer.end_line();
        }
        self.writer.blank_line();
        Ok(())
    }

    fn write_var_decl_stmt_line(&mut self, decl: &VarDeclStmt) -> Result<()> {
        let keyword = self.type_to_glsl(&decl.var_type.type_denoter)?;
        for var_decl in &decl.var_decls {
            if var_decl.flags.has(Flags::DISABLE_CODEGEN) {
                continue;
            }
            let dims = self.array_dims_to_glsl(&var_decl.array_dims);
            self.writer.begin_line();
            if decl.is_const() {
                self.writer.write("const ");
            }
            self.writer
                .write(&format!("{} {}{}", keyword, var_decl.ident, dims));
            if let Some(initializer) = &var_decl.initializer {
                self.writer.write(" = ");
                self.write_expr(initializer)?;
            }
            self.writer.write(";");
            self.writer.end_line();
        }
        Ok(())
    }

    /* ----- Functions ----- */

    fn write_function_decl(&mut self, decl: &FunctionDecl) -> Result<()> {
        if decl.code_block.is_none() {
            // Forward declarations are dropped; GLSL sources are emitted
            // definition-first in source order.
            return Ok(());
        }

        if decl.flags.has(Flags::IS_ENTRY_POINT) {
            self.write_wrappers()?;
            return self.write_entry_point(decl);
        }

        let return_keyword = self.type_to_glsl(&decl.return_type.type_denoter)?;

        let mut params = Vec::new();
        for param in &decl.parameters {
            let keyword = self.type_to_glsl(&param.var_type.type_denoter)?;
            let var_decl = param.var_decls.first().ok_or_else(|| {
                CompilerError::Internal("function parameter without declaration".to_string())
            })?;
            let dims = self.array_dims_to_glsl(&var_decl.array_dims);
            let modifier = match param.input_modifier.as_deref() {
                Some("out") => "out ",
                Some("inout") => "inout ",
                _ => "",
            };
            params.push(format!("{}{} {}{}", modifier, keyword, var_decl.ident, dims));
        }

        self.writer.write_line(&format!(
            "{} {}({})",
            return_keyword,
            decl.ident,
            params.join(", ")
        ));

        let block = decl.code_block.as_ref().expect("checked above");
        self.write_code_block(block)?;
        self.writer.blank_line();
        Ok(())
    }

    fn write_entry_point(&mut self, decl: &FunctionDecl) -> Result<()> {
        debug!("emitting entry point '{}'", decl.ident);

        self.writer.write_line("void main()");
        self.inside_entry_point = true;
        let block = decl.code_block.as_ref().expect("entry point has a body");
        let result = self.write_code_block(block);
        self.inside_entry_point = false;
        result
    }

    fn write_code_block(&mut self, block: &CodeBlock) -> Result<()> {
        self.writer.write_line("{");
        self.writer.push_indent();
        for stmt in &block.stmts {
            self.write_stmt(stmt)?;
        }
        self.writer.pop_indent();
        self.writer.write_line("}");
        Ok(())
    }

    /// Helper functions for intrinsics without a direct GLSL equivalent.
    fn write_wrappers(&mut self) -> Result<()> {
        if self.wrappers.contains(&Intrinsic::Clip) {
            self.writer.write_line("void clip(float x)");
            self.writer.write_line("{");
            self.writer.push_indent();
            self.writer.write_line("if (x < 0.0)");
            self.writer.push_indent();
            self.writer.write_line("discard;");
            self.writer.pop_indent();
            self.writer.pop_indent();
            self.writer.write_line("}");
            self.writer.blank_line();

            for dim in 2..=4 {
                self.writer.write_line(&format!("void clip(vec{} x)", dim));
                self.writer.write_line("{");
                self.writer.push_indent();
                self.writer.write_line(&format!(
                    "if (any(lessThan(x, vec{}(0.0))))",
                    dim
                ));
                self.writer.push_indent();
                self.writer.write_line("discard;");
                self.writer.pop_indent();
                self.writer.pop_indent();
                self.writer.write_line("}");
                self.writer.blank_line();
            }
        }
        Ok(())
    }

    /* ----- Statements ----- */

    fn write_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        self.write_stmt_comment(stmt);
        match &stmt.kind {
            StmtKind::Null => {
                self.writer.write_line(";");
                Ok(())
            }
            StmtKind::CodeBlock(block) => self.write_code_block(block),
            StmtKind::VarDecl(decl) => self.write_var_decl_stmt_line(decl),
            StmtKind::AliasDecl(_) | StmtKind::StructDecl(_) | StmtKind::SamplerDecl(_)
            | StmtKind::TextureDecl(_) | StmtKind::BufferDecl(_) | StmtKind::FunctionDecl(_) => {
                Ok(())
            }
            StmtKind::For {
                init,
                condition,
                iteration,
                body,
                ..
            } => {
                self.writer.begin_line();
                self.writer.write("for (");
                self.write_stmt_inline(init)?;
                self.writer.write(" ");
                if let Some(condition) = condition {
                    self.write_expr(condition)?;
                }
                self.writer.write("; ");
                if let Some(iteration) = iteration {
                    self.write_expr(iteration)?;
                }
                self.writer.write(")");
                self.writer.end_line();
                self.write_body_stmt(body)
            }
            StmtKind::While { condition, body, .. } => {
                self.writer.begin_line();
                self.writer.write("while (");
                self.write_expr(condition)?;
                self.writer.write(")");
                self.writer.end_line();
                self.write_body_stmt(body)
            }
            StmtKind::DoWhile { body, condition, .. } => {
                self.writer.write_line("do");
                self.write_body_stmt(body)?;
                self.writer.begin_line();
                self.writer.write("while (");
                self.write_expr(condition)?;
                self.writer.write(");");
                self.writer.end_line();
                Ok(())
            }
            StmtKind::If {
                condition,
                body,
                else_stmt,
                ..
            } => {
                self.writer.begin_line();
                self.writer.write("if (");
                self.write_expr(condition)?;
                self.writer.write(")");
                self.writer.end_line();
                self.write_body_stmt(body)?;
                if let Some(else_stmt) = else_stmt {
                    self.writer.write_line("else");
                    self.write_body_stmt(&else_stmt.body)?;
                }
                Ok(())
            }
            StmtKind::Switch {
                selector, cases, ..
            } => {
                self.writer.begin_line();
                self.writer.write("switch (");
                self.write_expr(selector)?;
                self.writer.write(")");
                self.writer.end_line();
                self.writer.write_line("{");
                for case in cases {
                    match &case.expr {
                        Some(expr) => {
                            self.writer.begin_line();
                            self.writer.write("case ");
                            self.write_expr(expr)?;
                            self.writer.write(":");
                            self.writer.end_line();
                        }
                        None => self.writer.write_line("default:"),
                    }
                    self.writer.push_indent();
                    for stmt in &case.stmts {
                        self.write_stmt(stmt)?;
                    }
                    self.writer.pop_indent();
                }
                self.writer.write_line("}");
                Ok(())
            }
            StmtKind::Expr(expr) => {
                // Statement-level clip with the inline flag becomes a
                // plain discard condition.
                if let ExprKind::Call(call) = &expr.kind {
                    if call.intrinsic == Some(Intrinsic::Clip)
                        && call.flags.has(Flags::CAN_INLINE_INTRINSIC_WRAPPER)
                    {
                        return self.write_inline_clip(call);
                    }
                }
                self.writer.begin_line();
                self.write_expr(expr)?;
                self.writer.write(";");
                self.writer.end_line();
                Ok(())
            }
            StmtKind::Return(expr) => self.write_return_stmt(stmt, expr.as_ref()),
            StmtKind::CtrlTransfer(transfer) => {
                self.writer.write_line(&format!("{};", transfer.spell()));
                Ok(())
            }
        }
    }

    /// Statement emitted without line handling (for-loop initializers).
    fn write_stmt_inline(&mut self, stmt: &Stmt) -> Result<()> {
        self.writer.push_options(WriterOptions {
            enable_indent: false,
            enable_new_line: false,
        });
        let result = self.write_stmt(stmt);
        self.writer.pop_options();
        result
    }

    fn write_body_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::CodeBlock(block) => self.write_code_block(block),
            _ => {
                self.writer.push_indent();
                let result = self.write_stmt(stmt);
                self.writer.pop_indent();
                result
            }
        }
    }

    fn write_inline_clip(&mut self, call: &FunctionCall) -> Result<()> {
        let arg = call.arguments.first().ok_or_else(|| {
            CompilerError::CodeGen("'clip' requires one argument".to_string(), Some(call.area))
        })?;
        self.writer.begin_line();
        self.writer.write("if (");
        match call.intrinsic_arg_type {
            Some(DataType::Vector(scalar, dims)) => {
                // GLSL's '<' is undefined for vector operands; use the
                // component-wise comparison like the wrapper function.
                let keyword = data_type_to_glsl(DataType::Vector(scalar, dims))
                    .unwrap_or_else(|| "vec4".to_string());
                let zero = if scalar.is_integral() { "0" } else { "0.0" };
                self.writer.write("any(lessThan(");
                self.write_expr(arg)?;
                self.writer.write(&format!(", {}({})))", keyword, zero));
            }
            _ => {
                self.write_expr(arg)?;
                self.writer.write(" < 0.0");
            }
        }
        self.writer.write(")");
        self.writer.end_line();
        self.writer.push_indent();
        self.writer.write_line("discard;");
        self.writer.pop_indent();
        Ok(())
    }

    fn write_return_stmt(&mut self, stmt: &Stmt, expr: Option<&Expr>) -> Result<()> {
        let terminal = stmt.flags.has(Flags::IS_END_OF_FUNCTION);

        if !self.inside_entry_point {
            self.writer.begin_line();
            self.writer.write("return");
            if let Some(expr) = expr {
                self.writer.write(" ");
                self.write_expr(expr)?;
            }
            self.writer.write(";");
            self.writer.end_line();
            return Ok(());
        }

        // Entry point: the return value is scattered over the output
        // interface.
        if let Some(expr) = expr {
            self.write_entry_point_output_assignment(expr)?;
        }

        if !terminal {
            self.writer.write_line("return;");
        }
        Ok(())
    }

    fn write_entry_point_output_assignment(&mut self, expr: &Expr) -> Result<()> {
        // Returning the output-aliasing variable: members were written
        // through the alias already.
        if let ExprKind::VarAccess(access) = &expr.kind {
            if self.entry.output_alias.as_deref() == Some(access.var_ident.ident.as_str())
                && access.var_ident.next.is_none()
            {
                return Ok(());
            }
        }

        if let Some(struct_ident) = self.entry.return_struct.clone() {
            // Struct-valued return of a general expression: assign every
            // member through the flattened interface.
            let members: Vec<(String, Option<IndexedSemantic>)> = self
                .structs
                .get(&struct_ident)
                .map(|info| {
                    info.members
                        .iter()
                        .map(|(ident, _, semantic)| (ident.clone(), semantic.clone()))
                        .collect()
                })
                .unwrap_or_default();

            for (member_ident, semantic) in members {
                let out_name = semantic
                    .as_ref()
                    .and_then(|s| self.output_name_for_semantic(s))
                    .unwrap_or_else(|| member_ident.clone());
                self.writer.begin_line();
                self.writer.write(&format!("{} = ", out_name));
                self.writer.write("(");
                self.write_expr(expr)?;
                self.writer.write(&format!(").{};", member_ident));
                self.writer.end_line();
            }
            return Ok(());
        }

        // Single-value return bound to one output semantic.
        let output = self.entry.outputs.first().cloned();
        match output {
            Some(io) => {
                let name = self
                    .output_name_for_semantic(&io.semantic)
                    .unwrap_or_else(|| self.io_var_name(&io, true));
                self.writer.begin_line();
                self.writer.write(&format!("{} = ", name));
                self.write_expr(expr)?;
                self.writer.write(";");
                self.writer.end_line();
                Ok(())
            }
            None => {
                self.writer.begin_line();
                self.write_expr(expr)?;
                self.writer.write(";");
                self.writer.end_line();
                Ok(())
            }
        }
    }

    /* ----- Types ----- */

    fn type_to_glsl(&mut self, denoter: &TypeDenoter) -> Result<String> {
        match self.resolve_alias(denoter) {
            TypeDenoter::Void => Ok("void".to_string()),
            TypeDenoter::Base(data_type) => data_type_to_glsl(data_type).ok_or_else(|| {
                CompilerError::CodeGen(
                    format!("data type '{}' has no GLSL counterpart", data_type),
                    None,
                )
            }),
            TypeDenoter::Texture(buffer_type) => texture_type_to_glsl(buffer_type)
                .map(str::to_string)
                .ok_or_else(|| {
                    CompilerError::CodeGen(
                        "texture type has no GLSL counterpart".to_string(),
                        None,
                    )
                }),
            TypeDenoter::Sampler => Ok("sampler2D".to_string()),
            TypeDenoter::Struct(ident) => Ok(ident),
            TypeDenoter::Alias(ident) => Ok(ident),
            TypeDenoter::Array(base, dims) => {
                let mut keyword = self.type_to_glsl(&base)?;
                for dim in dims {
                    match dim {
                        Some(size) => keyword.push_str(&format!("[{}]", size)),
                        None => keyword.push_str("[]"),
                    }
                }
                Ok(keyword)
            }
        }
    }

    fn array_dims_to_glsl(&self, dims: &[Expr]) -> String {
        let mut out = String::new();
        for dim in dims {
            match &dim.kind {
                ExprKind::Null => out.push_str("[]"),
                _ => {
                    out.push('[');
                    out.push_str(&expr_to_plain_string(dim));
                    out.push(']');
                }
            }
        }
        out
    }

    /* ----- Expressions ----- */

    fn write_expr(&mut self, expr: &Expr) -> Result<()> {
        match &expr.kind {
            ExprKind::Null => Ok(()),
            ExprKind::List(first, next) => {
                self.write_expr(first)?;
                self.writer.write(", ");
                self.write_expr(next)
            }
            ExprKind::Literal(literal) => {
                self.writer.write(&literal.value);
                Ok(())
            }
            ExprKind::TypeName(denoter) => {
                let keyword = self.type_to_glsl(denoter)?;
                self.writer.write(&keyword);
                Ok(())
            }
            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                self.write_expr(condition)?;
                self.writer.write(" ? ");
                self.write_expr(then_expr)?;
                self.writer.write(" : ");
                self.write_expr(else_expr)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.write_expr(lhs)?;
                self.writer.write(&format!(" {} ", op.spell()));
                self.write_expr(rhs)
            }
            ExprKind::Unary { op, expr } => {
                self.writer.write(op.spell());
                self.write_expr(expr)
            }
            ExprKind::PostUnary { op, expr } => {
                self.write_expr(expr)?;
                self.writer.write(op.spell());
                Ok(())
            }
            ExprKind::Call(call) => self.write_function_call(call),
            ExprKind::Bracket(inner) => {
                self.writer.write("(");
                self.write_expr(inner)?;
                self.writer.write(")");
                Ok(())
            }
            ExprKind::Suffix { expr, var_ident } => {
                self.write_expr(expr)?;
                self.writer.write(".");
                self.write_var_ident_plain(var_ident)
            }
            ExprKind::ArrayAccess { expr, indices } => {
                self.write_expr(expr)?;
                for index in indices {
                    self.writer.write("[");
                    self.write_expr(index)?;
                    self.writer.write("]");
                }
                Ok(())
            }
            ExprKind::Cast {
                type_denoter,
                expr,
            } => {
                let keyword = self.type_to_glsl(type_denoter)?;
                self.writer.write(&format!("{}(", keyword));
                self.write_expr(expr)?;
                self.writer.write(")");
                Ok(())
            }
            ExprKind::VarAccess(access) => {
                self.write_var_access(access)
            }
            ExprKind::Initializer(exprs) => {
                // Initializer lists require a constructor in GLSL; the
                // element-wise form is the closest portable rendition.
                self.writer.write("{ ");
                for (i, expr) in exprs.iter().enumerate() {
                    if i > 0 {
                        self.writer.write(", ");
                    }
                    self.write_expr(expr)?;
                }
                self.writer.write(" }");
                Ok(())
            }
        }
    }

    fn write_var_access(&mut self, access: &VarAccessExpr) -> Result<()> {
        self.write_var_ident(&access.var_ident)?;
        if let (Some(op), Some(assign_expr)) = (&access.assign_op, &access.assign_expr) {
            self.writer.write(&format!(" {} ", op.spell()));
            self.write_expr(assign_expr)?;
        }
        Ok(())
    }

    /// Writes an identifier chain, resolving entry-point interface
    /// aliases: struct parameters and the output-aliasing variable are
    /// replaced with their flattened member bindings.
    fn write_var_ident(&mut self, var_ident: &VarIdent) -> Result<()> {
        if self.inside_entry_point && var_ident.array_indices.is_empty() {
            // Input struct parameter: 'v.member' -> flattened member.
            if let Some(struct_ident) = self.param_structs.get(&var_ident.ident) {
                if let Some(next) = &var_ident.next {
                    let name = self
                        .member_io_name(struct_ident, &next.ident, false)
                        .unwrap_or_else(|| next.ident.clone());
                    self.writer.write(&name);
                    return self.write_var_ident_tail(next);
                }
            }
            // Output alias variable: 'o.member' -> output binding.
            if self.entry.output_alias.as_deref() == Some(var_ident.ident.as_str()) {
                if let Some(next) = &var_ident.next {
                    let struct_ident = self.entry.return_struct.clone().unwrap_or_default();
                    let name = self
                        .member_io_name(&struct_ident, &next.ident, true)
                        .unwrap_or_else(|| next.ident.clone());
                    self.writer.write(&name);
                    return self.write_var_ident_tail(next);
                }
            }
            // Parameter bound to a built-in: 'id.x' -> gl_GlobalInvocationID.x.
            if let Some(builtin) = self.param_builtins.get(&var_ident.ident) {
                let builtin = builtin.clone();
                self.writer.write(&builtin);
                return self.write_var_ident_tail(var_ident);
            }
        }

        self.write_var_ident_plain(var_ident)
    }

    fn member_io_name(&self, struct_ident: &str, member: &str, output: bool) -> Option<String> {
        let info = self.structs.get(struct_ident)?;
        let (_, _, semantic) = info.members.iter().find(|(ident, _, _)| ident == member)?;
        match semantic {
            Some(semantic) => {
                if let Some(builtin) = semantic_to_glsl(semantic, self.target, output) {
                    Some(builtin)
                } else {
                    Some(member.to_string())
                }
            }
            None => Some(member.to_string()),
        }
    }

    /// Remaining chain after the first (already written) component.
    fn write_var_ident_tail(&mut self, var_ident: &VarIdent) -> Result<()> {
        for index in &var_ident.array_indices {
            self.writer.write("[");
            self.write_expr(index)?;
            self.writer.write("]");
        }
        if let Some(next) = &var_ident.next {
            self.writer.write(".");
            self.writer.write(&next.ident);
            self.write_var_ident_tail(next)?;
        }
        Ok(())
    }

    fn write_var_ident_plain(&mut self, var_ident: &VarIdent) -> Result<()> {
        self.writer.write(&var_ident.ident);
        self.write_var_ident_tail(var_ident)
    }

    /* ----- Intrinsic calls ----- */

    fn write_function_call(&mut self, call: &FunctionCall) -> Result<()> {
        if let Some(intrinsic) = call.intrinsic {
            return self.write_intrinsic_call(call, intrinsic);
        }

        // Type constructor.
        if let Some(denoter) = &call.type_denoter {
            let keyword = self.type_to_glsl(denoter)?;
            self.writer.write(&keyword);
            return self.write_argument_list(&call.arguments, 0);
        }

        let var_ident = call.var_ident.as_ref().ok_or_else(|| {
            CompilerError::Internal("function call without name".to_string())
        })?;
        self.write_var_ident_plain(var_ident)?;
        self.write_argument_list(&call.arguments, 0)
    }

    fn write_argument_list(&mut self, arguments: &[Expr], skip: usize) -> Result<()> {
        self.writer.write("(");
        for (i, arg) in arguments.iter().skip(skip).enumerate() {
            if i > 0 {
                self.writer.write(", ");
            }
            self.write_expr(arg)?;
        }
        self.writer.write(")");
        Ok(())
    }

    fn write_intrinsic_call(&mut self, call: &FunctionCall, intrinsic: Intrinsic) -> Result<()> {
        use Intrinsic as I;

        // Texture-object methods carry the object in the identifier prefix.
        if intrinsic.is_texture_method() {
            return self.write_texture_intrinsic(call, intrinsic);
        }

        match intrinsic {
            I::Mul => {
                if call.arguments.len() == 2 {
                    self.writer.write("(");
                    self.write_expr(&call.arguments[0])?;
                    self.writer.write(") * (");
                    self.write_expr(&call.arguments[1])?;
                    self.writer.write(")");
                    Ok(())
                } else {
                    Err(CompilerError::CodeGen(
                        "'mul' requires two arguments".to_string(),
                        Some(call.area),
                    ))
                }
            }
            I::Saturate => {
                self.writer.write("clamp(");
                self.write_expr(call.arguments.first().ok_or_else(|| {
                    CompilerError::CodeGen(
                        "'saturate' requires one argument".to_string(),
                        Some(call.area),
                    )
                })?)?;
                self.writer.write(", 0.0, 1.0)");
                Ok(())
            }
            I::Clip => {
                // Reaching this point means the wrapper function is used.
                self.writer.write("clip");
                self.write_argument_list(&call.arguments, 0)
            }
            I::Tex1D2 | I::Tex2D2 | I::Tex3D2 | I::TexCube2 => {
                self.writer.write("texture");
                self.write_argument_list(&call.arguments, 0)
            }
            I::Tex1D4 | I::Tex2D4 | I::Tex3D4 | I::TexCube4 => {
                self.writer.write("textureGrad");
                self.write_argument_list(&call.arguments, 0)
            }
            I::AsUInt3 => Err(CompilerError::CodeGen(
                "'asuint' with three arguments has no GLSL counterpart".to_string(),
                Some(call.area),
            )),
            other => {
                let name = match other {
                    I::ATan2 => "atan",
                    I::Clamp => "clamp",
                    I::DDX => "dFdx",
                    I::DDY => "dFdy",
                    I::Frac => "fract",
                    I::FMod => "mod",
                    I::Lerp => "mix",
                    I::RSqrt => "inversesqrt",
                    I::AsFloat => "intBitsToFloat",
                    I::AsInt => "floatBitsToInt",
                    I::AsUInt1 => "floatBitsToUint",
                    I::AsDouble => "packDouble2x32",
                    I::GroupMemoryBarrier => "groupMemoryBarrier",
                    I::GroupMemoryBarrierWithGroupSync => "groupMemoryBarrier",
                    I::DeviceMemoryBarrier | I::AllMemoryBarrier => "memoryBarrier",
                    I::DeviceMemoryBarrierWithGroupSync
                    | I::AllMemoryBarrierWithGroupSync => "memoryBarrier",
                    I::Abs => "abs",
                    I::ACos => "acos",
                    I::All => "all",
                    I::Any => "any",
                    I::ASin => "asin",
                    I::ATan => "atan",
                    I::Ceil => "ceil",
                    I::Cos => "cos",
                    I::CosH => "cosh",
                    I::Cross => "cross",
                    I::Degrees => "degrees",
                    I::Determinant => "determinant",
                    I::Distance => "distance",
                    I::Dot => "dot",
                    I::Exp => "exp",
                    I::Exp2 => "exp2",
                    I::Floor => "floor",
                    I::IsInf => "isinf",
                    I::IsNaN => "isnan",
                    I::Length => "length",
                    I::Log => "log",
                    I::Log2 => "log2",
                    I::Log10 => "log2",
                    I::Max => "max",
                    I::Min => "min",
                    I::Normalize => "normalize",
                    I::Pow => "pow",
                    I::Radians => "radians",
                    I::Reflect => "reflect",
                    I::Refract => "refract",
                    I::Round => "round",
                    I::Sign => "sign",
                    I::Sin => "sin",
                    I::SinH => "sinh",
                    I::SmoothStep => "smoothstep",
                    I::Sqrt => "sqrt",
                    I::Step => "step",
                    I::Tan => "tan",
                    I::TanH => "tanh",
                    I::Transpose => "transpose",
                    I::Trunc => "trunc",
                    _ => {
                        return Err(CompilerError::CodeGen(
                            format!("intrinsic {:?} has no GLSL counterpart", other),
                            Some(call.area),
                        ))
                    }
                };
                // log10(x) = log2(x) / log2(10)
                if other == I::Log10 {
                    self.writer.write("(log2");
                    self.write_argument_list(&call.arguments, 0)?;
                    self.writer.write(" / log2(10.0))");
                    return Ok(());
                }
                self.writer.write(name);
                self.write_argument_list(&call.arguments, 0)
            }
        }
    }

    fn write_texture_intrinsic(&mut self, call: &FunctionCall, intrinsic: Intrinsic) -> Result<()> {
        use Intrinsic as I;

        let object = call.var_ident.as_ref().ok_or_else(|| {
            CompilerError::Internal("texture intrinsic without object".to_string())
        })?;
        let object_name = object.ident.clone();

        // Storage buffers are indexed directly.
        if self.storage_buffers.contains(&object_name) {
            match intrinsic {
                I::TextureLoad1 | I::TextureLoad2 | I::TextureLoad3 => {
                    self.writer.write(&object_name);
                    self.writer.write("[");
                    self.write_expr(call.arguments.first().ok_or_else(|| {
                        CompilerError::CodeGen(
                            "'Load' requires an index argument".to_string(),
                            Some(call.area),
                        )
                    })?)?;
                    self.writer.write("]");
                    return Ok(());
                }
                _ => {
                    return Err(CompilerError::CodeGen(
                        "unsupported buffer intrinsic for GLSL output".to_string(),
                        Some(call.area),
                    ))
                }
            }
        }

        // Sampled textures: the separate HLSL sampler argument is dropped
        // in favor of the combined GLSL sampler.
        let (name, skip_sampler, append_lod_zero) = match intrinsic {
            I::TextureSample2 => ("texture", true, false),
            I::TextureSample3 => ("textureOffset", true, false),
            I::TextureSample4 | I::TextureSample5 => {
                self.reports.warning(
                    "additional sample arguments are ignored for GLSL output",
                    Some(call.area),
                );
                ("texture", true, false)
            }
            I::TextureSampleBias3 | I::TextureSampleBias4 | I::TextureSampleBias5
            | I::TextureSampleBias6 => ("texture", true, false),
            I::TextureSampleLevel3 => ("textureLod", true, false),
            I::TextureSampleLevel4 | I::TextureSampleLevel5 => ("textureLodOffset", true, false),
            I::TextureSampleGrad4 | I::TextureSampleGrad5 | I::TextureSampleGrad6
            | I::TextureSampleGrad7 => ("textureGrad", true, false),
            I::TextureSampleCmp3 | I::TextureSampleCmp4 | I::TextureSampleCmp5
            | I::TextureSampleCmp6 => ("texture", true, false),
            I::TextureLoad1 | I::TextureLoad2 | I::TextureLoad3 => ("texelFetch", false, true),
            I::TextureGetDimensions => ("textureSize", false, true),
            _ => {
                return Err(CompilerError::CodeGen(
                    "unsupported texture intrinsic for GLSL output".to_string(),
                    Some(call.area),
                ))
            }
        };

        // Trailing offset/clamp/status arguments with no GLSL counterpart
        // are dropped.
        let args_limit = match intrinsic {
            I::TextureSample4 | I::TextureSample5 => Some(2),
            I::TextureSampleBias4 | I::TextureSampleBias5 | I::TextureSampleBias6 => Some(2),
            I::TextureSampleCmp4 | I::TextureSampleCmp5 | I::TextureSampleCmp6 => Some(2),
            I::TextureSampleLevel5 => Some(3),
            I::TextureSampleGrad5 | I::TextureSampleGrad6 | I::TextureSampleGrad7 => Some(3),
            _ => None,
        };

        self.writer.write(name);
        self.writer.write("(");
        self.writer.write(&object_name);
        let skip = usize::from(skip_sampler);
        let limit = args_limit.unwrap_or(usize::MAX);
        for arg in call.arguments.iter().skip(skip).take(limit) {
            self.writer.write(", ");
            self.write_expr(arg)?;
        }
        if append_lod_zero && call.arguments.len() <= skip + 1 {
            self.writer.write(", 0");
        }
        self.writer.write(")");
        Ok(())
    }
}

/// Renders simple constant expressions (array dimensions) without writer
/// state.
fn expr_to_plain_string(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Literal(literal) => literal.value.clone(),
        ExprKind::VarAccess(access) => access.var_ident.to_string(),
        ExprKind::Binary { op, lhs, rhs } => format!(
            "{} {} {}",
            expr_to_plain_string(lhs),
            op.spell(),
            expr_to_plain_string(rhs)
        ),
        ExprKind::Bracket(inner) => format!("({})", expr_to_plain_string(inner)),
        ExprKind::Unary { op, expr } => format!("{}{}", op.spell(), expr_to_plain_string(expr)),
        _ => String::new(),
    }
}
