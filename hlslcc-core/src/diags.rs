//! Diagnostic utilities for AST formatting and display.
//!
//! Provides a compact formatter for parse trees, used by the `show_ast`
//! option.

use crate::ast::*;
use std::fmt::Write;

/// Formatter for AST nodes that produces readable, indented output.
pub struct AstFormatter {
    output: String,
    indent: usize,
}

impl AstFormatter {
    pub fn new() -> Self {
        AstFormatter {
            output: String::new(),
            indent: 0,
        }
    }

    /// Format a program and return the formatted string.
    pub fn format_program(program: &Program) -> String {
        let mut formatter = AstFormatter::new();
        for stmt in &program.global_stmts {
            formatter.write_stmt(stmt);
        }
        formatter.output
    }

    fn write_line(&mut self, content: &str) {
        let indent = "  ".repeat(self.indent);
        let _ = writeln!(self.output, "{}{}", indent, content);
    }

    fn write_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Null => self.write_line("null-stmt"),
            StmtKind::CodeBlock(block) => {
                self.write_line("code-block");
                self.indent += 1;
                for stmt in &block.stmts {
                    self.write_stmt(stmt);
                }
                self.indent -= 1;
            }
            StmtKind::FunctionDecl(decl) => {
                let entry = if decl.flags.has(Flags::IS_ENTRY_POINT) {
                    " (entry point)"
                } else {
                    ""
                };
                self.write_line(&format!(
                    "function-decl '{}' -> {}{}",
                    decl.ident, decl.return_type.type_denoter, entry
                ));
                self.indent += 1;
                for param in &decl.parameters {
                    self.write_var_decl_stmt("param", param);
                }
                if let Some(block) = &decl.code_block {
                    for stmt in &block.stmts {
                        self.write_stmt(stmt);
                    }
                }
                self.indent -= 1;
            }
            StmtKind::BufferDecl(decl) => {
                self.write_line(&format!("buffer-decl '{}'", decl.ident));
                self.indent += 1;
                for member in &decl.members {
                    self.write_var_decl_stmt("member", member);
                }
                self.indent -= 1;
            }
            StmtKind::TextureDecl(decl) => {
                for texture in &decl.texture_decls {
                    self.write_line(&format!(
                        "texture-decl '{}' ({:?})",
                        texture.ident, decl.texture_type
                    ));
                }
            }
            StmtKind::SamplerDecl(decl) => {
                for sampler in &decl.sampler_decls {
                    self.write_line(&format!(
                        "sampler-decl '{}' ({} state values)",
                        sampler.ident,
                        sampler.sampler_values.len()
                    ));
                }
            }
            StmtKind::StructDecl(decl) => self.write_struct_decl(&decl.struct_decl),
            StmtKind::VarDecl(decl) => self.write_var_decl_stmt("var-decl", decl),
            StmtKind::AliasDecl(decl) => {
                for alias in &decl.alias_decls {
                    self.write_line(&format!(
                        "alias-decl '{}' = {}",
                        alias.ident, alias.type_denoter
                    ));
                }
            }
            StmtKind::For { init, condition, iteration, body, .. } => {
                self.write_line("for-stmt");
                self.indent += 1;
                self.write_stmt(init);
                if let Some(condition) = condition {
                    self.write_line(&format!("condition: {}", self.format_expr(condition)));
                }
                if let Some(iteration) = iteration {
                    self.write_line(&format!("iteration: {}", self.format_expr(iteration)));
                }
                self.write_stmt(body);
                self.indent -= 1;
            }
            StmtKind::While { condition, body, .. } => {
                self.write_line(&format!("while-stmt ({})", self.format_expr(condition)));
                self.indent += 1;
                self.write_stmt(body);
                self.indent -= 1;
            }
            StmtKind::DoWhile { body, condition, .. } => {
                self.write_line(&format!("do-while-stmt ({})", self.format_expr(condition)));
                self.indent += 1;
                self.write_stmt(body);
                self.indent -= 1;
            }
            StmtKind::If { condition, body, else_stmt, .. } => {
                self.write_line(&format!("if-stmt ({})", self.format_expr(condition)));
                self.indent += 1;
                self.write_stmt(body);
                self.indent -= 1;
                if let Some(else_stmt) = else_stmt {
                    self.write_line("else-stmt");
                    self.indent += 1;
                    self.write_stmt(&else_stmt.body);
                    self.indent -= 1;
                }
            }
            StmtKind::Switch { selector, cases, .. } => {
                self.write_line(&format!("switch-stmt ({})", self.format_expr(selector)));
                self.indent += 1;
                for case in cases {
                    match &case.expr {
                        Some(expr) => self.write_line(&format!("case {}:", self.format_expr(expr))),
                        None => self.write_line("default:"),
                    }
                    self.indent += 1;
                    for stmt in &case.stmts {
                        self.write_stmt(stmt);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
            }
            StmtKind::Expr(expr) => {
                self.write_line(&format!("expr-stmt: {}", self.format_expr(expr)));
            }
            StmtKind::Return(expr) => match expr {
                Some(expr) => self.write_line(&format!("return {}", self.format_expr(expr))),
                None => self.write_line("return"),
            },
            StmtKind::CtrlTransfer(transfer) => {
                self.write_line(&format!("ctrl-transfer '{}'", transfer.spell()));
            }
        }
    }

    fn write_struct_decl(&mut self, decl: &StructDecl) {
        let mut header = format!("struct-decl '{}'", decl.ident);
        if let Some(base) = &decl.base_struct_name {
            header.push_str(&format!(" : {}", base));
        }
        self.write_line(&header);
        self.indent += 1;
        for member in &decl.members {
            self.write_var_decl_stmt("member", member);
        }
        self.indent -= 1;
    }

    fn write_var_decl_stmt(&mut self, label: &str, decl: &VarDeclStmt) {
        for var_decl in &decl.var_decls {
            let mut line = format!(
                "{} '{}': {}",
                label, var_decl.ident, decl.var_type.type_denoter
            );
            if let Some(semantic) = &var_decl.semantic {
                line.push_str(&format!(" : {}", semantic.to_string()));
            }
            if let Some(initializer) = &var_decl.initializer {
                line.push_str(&format!(" = {}", self.format_expr(initializer)));
            }
            self.write_line(&line);
        }
    }

    fn format_expr(&self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Null => "<null>".to_string(),
            ExprKind::List(first, next) => {
                format!("{}, {}", self.format_expr(first), self.format_expr(next))
            }
            ExprKind::Literal(literal) => literal.value.clone(),
            ExprKind::TypeName(denoter) => denoter.to_string(),
            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => format!(
                "{} ? {} : {}",
                self.format_expr(condition),
                self.format_expr(then_expr),
                self.format_expr(else_expr)
            ),
            ExprKind::Binary { op, lhs, rhs } => format!(
                "{} {} {}",
                self.format_expr(lhs),
                op.spell(),
                self.format_expr(rhs)
            ),
            ExprKind::Unary { op, expr } => format!("{}{}", op.spell(), self.format_expr(expr)),
            ExprKind::PostUnary { op, expr } => {
                format!("{}{}", self.format_expr(expr), op.spell())
            }
            ExprKind::Call(call) => {
                let name = call
                    .var_ident
                    .as_ref()
                    .map(|v| v.to_string())
                    .or_else(|| call.type_denoter.as_ref().map(|t| t.to_string()))
                    .unwrap_or_default();
                let args: Vec<String> =
                    call.arguments.iter().map(|a| self.format_expr(a)).collect();
                format!("{}({})", name, args.join(", "))
            }
            ExprKind::Bracket(inner) => format!("({})", self.format_expr(inner)),
            ExprKind::Suffix { expr, var_ident } => {
                format!("{}.{}", self.format_expr(expr), var_ident.to_string())
            }
            ExprKind::ArrayAccess { expr, indices } => {
                let mut out = self.format_expr(expr);
                for index in indices {
                    out.push_str(&format!("[{}]", self.format_expr(index)));
                }
                out
            }
            ExprKind::Cast {
                type_denoter,
                expr,
            } => format!("({}){}", type_denoter, self.format_expr(expr)),
            ExprKind::VarAccess(access) => {
                let mut out = access.var_ident.to_string();
                if let (Some(op), Some(assign)) = (&access.assign_op, &access.assign_expr) {
                    out.push_str(&format!(" {} {}", op.spell(), self.format_expr(assign)));
                }
                out
            }
            ExprKind::Initializer(exprs) => {
                let items: Vec<String> = exprs.iter().map(|e| self.format_expr(e)).collect();
                format!("{{ {} }}", items.join(", "))
            }
        }
    }
}

impl Default for AstFormatter {
    fn default() -> Self {
        Self::new()
    }
}
