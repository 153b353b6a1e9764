//! GLSL lowering pass.
//!
//! Runs over the decorated AST before emission: renames identifiers that
//! collide with reserved GLSL words (with a configurable prefix) and
//! normalizes literals that GLSL does not accept.

use crate::ast::*;
use crate::glsl::keywords::is_glsl_keyword;
use std::collections::HashMap;

pub struct GlslConverter {
    prefix: String,
    /// Scoped rename maps, innermost last.
    renames: Vec<HashMap<String, String>>,
}

impl GlslConverter {
    pub fn new(name_mangling_prefix: &str) -> Self {
        GlslConverter {
            prefix: name_mangling_prefix.to_string(),
            renames: vec![HashMap::new()],
        }
    }

    pub fn convert(mut self, program: &mut Program) {
        for stmt in &mut program.global_stmts {
            self.convert_stmt(stmt);
        }
    }

    fn open_scope(&mut self) {
        self.renames.push(HashMap::new());
    }

    fn close_scope(&mut self) {
        self.renames.pop();
    }

    fn mangle(&mut self, ident: &mut String) {
        if is_glsl_keyword(ident) {
            let renamed = format!("{}{}", self.prefix, ident);
            self.renames
                .last_mut()
                .expect("rename scope missing")
                .insert(ident.clone(), renamed.clone());
            *ident = renamed;
        }
    }

    fn renamed(&self, ident: &str) -> Option<&String> {
        self.renames.iter().rev().find_map(|scope| scope.get(ident))
    }

    fn convert_stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Null | StmtKind::CtrlTransfer(_) => {}
            StmtKind::CodeBlock(block) => self.convert_code_block(block),
            StmtKind::FunctionDecl(decl) => {
                self.mangle(&mut decl.ident);
                self.open_scope();
                for param in &mut decl.parameters {
                    self.convert_var_decl_stmt(param);
                }
                if let Some(block) = &mut decl.code_block {
                    self.convert_code_block(block);
                }
                self.close_scope();
            }
            StmtKind::BufferDecl(decl) => {
                self.mangle(&mut decl.ident);
                for member in &mut decl.members {
                    self.convert_var_decl_stmt(member);
                }
            }
            StmtKind::TextureDecl(decl) => {
                for texture in &mut decl.texture_decls {
                    self.mangle(&mut texture.ident);
                }
            }
            StmtKind::SamplerDecl(decl) => {
                for sampler in &mut decl.sampler_decls {
                    self.mangle(&mut sampler.ident);
                }
            }
            StmtKind::StructDecl(decl) => self.convert_struct_decl(&mut decl.struct_decl),
            StmtKind::VarDecl(decl) => self.convert_var_decl_stmt(decl),
            StmtKind::AliasDecl(decl) => {
                if let Some(struct_decl) = &mut decl.struct_decl {
                    self.convert_struct_decl(struct_decl);
                }
            }
            StmtKind::For {
                init,
                condition,
                iteration,
                body,
                ..
            } => {
                self.open_scope();
                self.convert_stmt(init);
                if let Some(condition) = condition {
                    self.convert_expr(condition);
                }
                if let Some(iteration) = iteration {
                    self.convert_expr(iteration);
                }
                self.convert_stmt(body);
                self.close_scope();
            }
            StmtKind::While { condition, body, .. } => {
                self.convert_expr(condition);
                self.convert_stmt(body);
            }
            StmtKind::DoWhile { body, condition, .. } => {
                self.convert_stmt(body);
                self.convert_expr(condition);
            }
            StmtKind::If {
                condition,
                body,
                else_stmt,
                ..
            } => {
                self.convert_expr(condition);
                self.convert_stmt(body);
                if let Some(else_stmt) = else_stmt {
                    self.convert_stmt(&mut else_stmt.body);
                }
            }
            StmtKind::Switch {
                selector, cases, ..
            } => {
                self.convert_expr(selector);
                for case in cases {
                    if let Some(expr) = &mut case.expr {
                        self.convert_expr(expr);
                    }
                    for stmt in &mut case.stmts {
                        self.convert_stmt(stmt);
                    }
                }
            }
            StmtKind::Expr(expr) => self.convert_expr(expr),
            StmtKind::Return(Some(expr)) => self.convert_expr(expr),
            StmtKind::Return(None) => {}
        }
    }

    fn convert_code_block(&mut self, block: &mut CodeBlock) {
        self.open_scope();
        for stmt in &mut block.stmts {
            self.convert_stmt(stmt);
        }
        self.close_scope();
    }

    fn convert_struct_decl(&mut self, decl: &mut StructDecl) {
        self.mangle(&mut decl.ident);
        for member in &mut decl.members {
            for var_decl in &mut member.var_decls {
                self.mangle(&mut var_decl.ident);
            }
        }
    }

    fn convert_var_decl_stmt(&mut self, stmt: &mut VarDeclStmt) {
        if let Some(struct_decl) = &mut stmt.var_type.struct_decl {
            self.convert_struct_decl(struct_decl);
        }
        for decl in &mut stmt.var_decls {
            for dim in &mut decl.array_dims {
                self.convert_expr(dim);
            }
            if let Some(initializer) = &mut decl.initializer {
                self.convert_expr(initializer);
            }
            self.mangle(&mut decl.ident);
        }
    }

    fn convert_var_ident(&mut self, var_ident: &mut VarIdent) {
        if let Some(renamed) = self.renamed(&var_ident.ident) {
            var_ident.ident = renamed.clone();
        }
        for index in &mut var_ident.array_indices {
            self.convert_expr(index);
        }
        if let Some(next) = &mut var_ident.next {
            // Member components are renamed only if their name was mangled
            // in an enclosing struct declaration.
            if let Some(renamed) = self.renamed(&next.ident) {
                next.ident = renamed.clone();
            }
            for index in &mut next.array_indices {
                self.convert_expr(index);
            }
        }
    }

    fn convert_expr(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Null | ExprKind::TypeName(_) => {}
            ExprKind::Literal(literal) => {
                // GLSL has no half-precision literal suffix.
                if literal.value.ends_with(['h', 'H']) {
                    literal.value.pop();
                }
            }
            ExprKind::List(first, next) => {
                self.convert_expr(first);
                self.convert_expr(next);
            }
            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                self.convert_expr(condition);
                self.convert_expr(then_expr);
                self.convert_expr(else_expr);
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.convert_expr(lhs);
                self.convert_expr(rhs);
            }
            ExprKind::Unary { expr, .. } | ExprKind::PostUnary { expr, .. } => {
                self.convert_expr(expr)
            }
            ExprKind::Call(call) => {
                if let Some(var_ident) = &mut call.var_ident {
                    // Only the object prefix is user-renamable; intrinsic
                    // method names stay.
                    if call.intrinsic.is_none() || var_ident.next.is_some() {
                        if let Some(renamed) = self.renamed(&var_ident.ident) {
                            var_ident.ident = renamed.clone();
                        }
                    }
                }
                for arg in &mut call.arguments {
                    self.convert_expr(arg);
                }
            }
            ExprKind::Bracket(inner) => self.convert_expr(inner),
            ExprKind::Suffix { expr, var_ident } => {
                self.convert_expr(expr);
                if let Some(renamed) = self.renamed(&var_ident.ident) {
                    var_ident.ident = renamed.clone();
                }
            }
            ExprKind::ArrayAccess { expr, indices } => {
                self.convert_expr(expr);
                for index in indices {
                    self.convert_expr(index);
                }
            }
            ExprKind::Cast { expr, .. } => self.convert_expr(expr),
            ExprKind::VarAccess(access) => {
                self.convert_var_ident(&mut access.var_ident);
                if let Some(assign_expr) = &mut access.assign_expr {
                    self.convert_expr(assign_expr);
                }
            }
            ExprKind::Initializer(exprs) => {
                for expr in exprs {
                    self.convert_expr(expr);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceArea;
    use crate::ty::{DataType, ScalarType, TypeDenoter};

    #[test]
    fn test_reserved_identifier_is_renamed() {
        let mut program = Program::new();
        program.global_stmts.push(Stmt::new(
            StmtKind::VarDecl(VarDeclStmt {
                input_modifier: None,
                storage_classes: Vec::new(),
                type_modifiers: Vec::new(),
                var_type: VarType {
                    struct_decl: None,
                    type_denoter: TypeDenoter::Base(DataType::Scalar(ScalarType::Float)),
                    area: SourceArea::ignore(),
                },
                var_decls: vec![VarDecl {
                    ident: "varying".to_string(),
                    array_dims: Vec::new(),
                    semantic: None,
                    pack_offset: None,
                    initializer: None,
                    flags: Flags::default(),
                    area: SourceArea::ignore(),
                }],
                area: SourceArea::ignore(),
            }),
            SourceArea::ignore(),
        ));

        GlslConverter::new("xst_").convert(&mut program);

        match &program.global_stmts[0].kind {
            StmtKind::VarDecl(decl) => assert_eq!(decl.var_decls[0].ident, "xst_varying"),
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_half_literal_suffix_is_stripped() {
        let mut expr = Expr::new(
            ExprKind::Literal(LiteralExpr {
                data_type: DataType::Scalar(ScalarType::Float),
                value: "1.5h".to_string(),
            }),
            SourceArea::ignore(),
        );
        GlslConverter::new("xst_").convert_expr(&mut expr);
        match &expr.kind {
            ExprKind::Literal(literal) => assert_eq!(literal.value, "1.5"),
            other => panic!("unexpected expression: {:?}", other),
        }
    }
}
