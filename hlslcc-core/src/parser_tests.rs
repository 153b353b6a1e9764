use crate::ast::*;
use crate::parser::parse_source;
use crate::report::ReportHandler;
use crate::ty::{BufferType, DataType, ScalarType, TypeDenoter};
use crate::ShaderTarget;

/// Parse input and return the program, panicking on failure.
fn parse_ok(source: &str) -> Program {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut reports = ReportHandler::new(None);
    match parse_source(source, "test.hlsl", &mut reports) {
        Some(program) => program,
        None => panic!("parse failed for source:\n{}", source),
    }
}

/// Parse input, expecting failure; returns the number of recorded errors.
fn parse_err(source: &str) -> usize {
    let mut reports = ReportHandler::new(None);
    let result = parse_source(source, "test.hlsl", &mut reports);
    assert!(
        result.is_none(),
        "expected parse error, but parsing succeeded for:\n{}",
        source
    );
    reports.num_errors()
}

fn parse_warnings(source: &str) -> usize {
    let mut reports = ReportHandler::new(None);
    let result = parse_source(source, "test.hlsl", &mut reports);
    assert!(result.is_some(), "parse failed for source:\n{}", source);
    reports.num_warnings()
}

/// User statements, skipping the pre-defined alias declarations.
fn user_stmts(program: &Program) -> Vec<&Stmt> {
    program
        .global_stmts
        .iter()
        .filter(|s| !s.flags.has(Flags::DISABLE_CODEGEN))
        .collect()
}

/// The single statement of the only function body in the program.
fn single_body_stmt(program: &Program) -> &Stmt {
    for stmt in &program.global_stmts {
        if let StmtKind::FunctionDecl(decl) = &stmt.kind {
            let block = decl.code_block.as_ref().expect("function has a body");
            assert_eq!(block.stmts.len(), 1, "expected exactly one body statement");
            return &block.stmts[0];
        }
    }
    panic!("no function declaration found");
}

#[test]
fn test_minimal_vertex_shader_parses() {
    let program = parse_ok(
        "float4 main(float3 pos : POSITION) : SV_Position { return float4(pos, 1.0); }",
    );
    let stmts = user_stmts(&program);
    assert_eq!(stmts.len(), 1);
    match &stmts[0].kind {
        StmtKind::FunctionDecl(decl) => {
            assert_eq!(decl.ident, "main");
            assert_eq!(decl.parameters.len(), 1);
            assert_eq!(
                decl.semantic.as_ref().unwrap().semantic,
                Semantic::System(SystemValue::Position)
            );
        }
        other => panic!("expected function declaration, got {:?}", other),
    }
}

#[test]
fn test_cast_disambiguation_with_typedef() {
    // With the typedef in scope, '(X)-(1)' is a cast of the unary
    // expression '-(1)'.
    let program = parse_ok("typedef int X;\nvoid f() { (X)-(1); }");
    let stmt = single_body_stmt(&program);
    match &stmt.kind {
        StmtKind::Expr(expr) => match &expr.kind {
            ExprKind::Cast { type_denoter, expr } => {
                assert_eq!(type_denoter, &TypeDenoter::Alias("X".to_string()));
                assert!(
                    matches!(expr.kind, ExprKind::Unary { op: UnaryOp::Negate, .. }),
                    "cast operand should be a negation, got {:?}",
                    expr.kind
                );
            }
            other => panic!("expected cast expression, got {:?}", other),
        },
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_cast_disambiguation_without_typedef() {
    // The same text parses as a binary subtraction when 'X' is a variable.
    let program = parse_ok("static int X = 0;\nvoid f() { (X)-(1); }");
    let stmt = single_body_stmt(&program);
    match &stmt.kind {
        StmtKind::Expr(expr) => {
            assert!(
                matches!(expr.kind, ExprKind::Binary { op: BinaryOp::Sub, .. }),
                "expected binary subtraction, got {:?}",
                expr.kind
            );
        }
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_cast_from_struct_name() {
    let program = parse_ok("struct S { int a; };\nvoid f() { (S)-(1); }");
    let stmt = single_body_stmt(&program);
    match &stmt.kind {
        StmtKind::Expr(expr) => assert!(matches!(expr.kind, ExprKind::Cast { .. })),
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_predefined_type_aliases() {
    // DWORD, FLOAT, VECTOR, MATRIX and STRING are registered up front.
    let program = parse_ok("void f() { (MATRIX)-(1); }");
    let stmt = single_body_stmt(&program);
    assert!(matches!(stmt.kind, StmtKind::Expr(Expr { kind: ExprKind::Cast { .. }, .. })));
}

#[test]
fn test_generic_vector_and_matrix_types() {
    let program = parse_ok("vector<float, 3> v;\nmatrix<int, 2, 4> m;\nvector d;");
    let stmts = user_stmts(&program);
    let denoter = |stmt: &Stmt| match &stmt.kind {
        StmtKind::VarDecl(decl) => decl.var_type.type_denoter.clone(),
        other => panic!("expected variable declaration, got {:?}", other),
    };
    assert_eq!(
        denoter(stmts[0]),
        TypeDenoter::Base(DataType::Vector(ScalarType::Float, 3))
    );
    assert_eq!(
        denoter(stmts[1]),
        TypeDenoter::Base(DataType::Matrix(ScalarType::Int, 2, 4))
    );
    // 'vector' without template arguments defaults to float4.
    assert_eq!(
        denoter(stmts[2]),
        TypeDenoter::Base(DataType::Vector(ScalarType::Float, 4))
    );
}

#[test]
fn test_template_greater_than_is_not_binary_op() {
    // The '>' closing the template must not be parsed as a comparison,
    // while a bracketed expression inside the template may use one.
    let program = parse_ok("matrix<float, (1 > 0) ? 4 : 2, 4> m;");
    let stmts = user_stmts(&program);
    match &stmts[0].kind {
        StmtKind::VarDecl(decl) => assert_eq!(
            decl.var_type.type_denoter,
            TypeDenoter::Base(DataType::Matrix(ScalarType::Float, 4, 4))
        ),
        other => panic!("expected variable declaration, got {:?}", other),
    }
}

#[test]
fn test_texture_with_template_arguments() {
    let program = parse_ok("Texture2D<float4> tex : register(t3);");
    let stmts = user_stmts(&program);
    match &stmts[0].kind {
        StmtKind::TextureDecl(decl) => {
            assert_eq!(decl.texture_type, BufferType::Texture2D);
            assert_eq!(
                decl.color_type,
                Some(DataType::Vector(ScalarType::Float, 4))
            );
            let texture = &decl.texture_decls[0];
            assert_eq!(texture.ident, "tex");
            assert_eq!(texture.slot_registers.len(), 1);
            assert_eq!(texture.slot_registers[0].slot, 3);
            assert_eq!(
                texture.slot_registers[0].register_type,
                RegisterType::Texture
            );
        }
        other => panic!("expected texture declaration, got {:?}", other),
    }
}

#[test]
fn test_register_with_profile_and_subcomponent() {
    let program = parse_ok("Texture2D tex : register(ps, t2[1]);");
    let stmts = user_stmts(&program);
    match &stmts[0].kind {
        StmtKind::TextureDecl(decl) => {
            let register = &decl.texture_decls[0].slot_registers[0];
            assert_eq!(register.shader_target, Some(ShaderTarget::Fragment));
            // The sub component is folded into the slot index.
            assert_eq!(register.slot, 3);
        }
        other => panic!("expected texture declaration, got {:?}", other),
    }
}

#[test]
fn test_packoffset_only_in_constant_buffer() {
    assert!(parse_err("float4 color : packoffset(c0);") >= 1);

    let program = parse_ok("cbuffer Settings { float4 color : packoffset(c0); }");
    let stmts = user_stmts(&program);
    match &stmts[0].kind {
        StmtKind::BufferDecl(decl) => {
            assert_eq!(decl.ident, "Settings");
            let member = &decl.members[0].var_decls[0];
            assert_eq!(
                member.pack_offset.as_ref().unwrap().register_name,
                "c0"
            );
        }
        other => panic!("expected buffer declaration, got {:?}", other),
    }
}

#[test]
fn test_duplicate_packoffset_warns_and_keeps_last() {
    let mut reports = ReportHandler::new(None);
    let program = parse_source(
        "cbuffer Settings { float4 color : packoffset(c0) : packoffset(c1); }",
        "test.hlsl",
        &mut reports,
    )
    .expect("parse failed");
    assert_eq!(reports.num_warnings(), 1);

    let stmts: Vec<&Stmt> = program
        .global_stmts
        .iter()
        .filter(|s| !s.flags.has(Flags::DISABLE_CODEGEN))
        .collect();
    match &stmts[0].kind {
        StmtKind::BufferDecl(decl) => {
            let member = &decl.members[0].var_decls[0];
            assert_eq!(member.pack_offset.as_ref().unwrap().register_name, "c1");
        }
        other => panic!("expected buffer declaration, got {:?}", other),
    }
}

#[test]
fn test_register_on_variable_is_warned_and_ignored() {
    assert_eq!(parse_warnings("float4 color : register(c0);"), 1);
}

#[test]
fn test_techniques_are_ignored_with_warning() {
    let source = "technique T0 { pass P0 { } pass P1 { } }\nfloat x;";
    assert_eq!(parse_warnings(source), 1);
    let program = parse_ok(source);
    let stmts = user_stmts(&program);
    assert_eq!(stmts.len(), 1);
    assert!(matches!(stmts[0].kind, StmtKind::VarDecl(_)));
}

#[test]
fn test_struct_inheritance_rules() {
    // Single inheritance parses.
    let program = parse_ok("struct A { int a; };\nstruct B : A { int b; };");
    let stmts = user_stmts(&program);
    match &stmts[1].kind {
        StmtKind::StructDecl(decl) => {
            assert_eq!(decl.struct_decl.base_struct_name.as_deref(), Some("A"));
        }
        other => panic!("expected struct declaration, got {:?}", other),
    }

    // Multiple and recursive inheritance are rejected.
    assert!(parse_err("struct A { int a; };\nstruct B : A, A { int b; };") >= 1);
    assert!(parse_err("struct R : R { int x; };") >= 1);
}

#[test]
fn test_statement_disambiguation_from_identifier() {
    let source = "typedef float2 Coord;\n\
                  void f() {\n\
                  \tCoord uv;\n\
                  \tuv.x = 1.0;\n\
                  \tg(uv);\n\
                  \tuv.x++;\n\
                  }\n\
                  void g(float2 v) { }";
    let program = parse_ok(source);
    let body = match &user_stmts(&program)[1].kind {
        StmtKind::FunctionDecl(decl) => decl.code_block.as_ref().unwrap(),
        other => panic!("expected function declaration, got {:?}", other),
    };
    assert!(matches!(body.stmts[0].kind, StmtKind::VarDecl(_)));
    assert!(matches!(
        body.stmts[1].kind,
        StmtKind::Expr(Expr { kind: ExprKind::VarAccess(_), .. })
    ));
    assert!(matches!(
        body.stmts[2].kind,
        StmtKind::Expr(Expr { kind: ExprKind::Call(_), .. })
    ));
    assert!(matches!(
        body.stmts[3].kind,
        StmtKind::Expr(Expr { kind: ExprKind::PostUnary { .. }, .. })
    ));
}

#[test]
fn test_switch_case_scanning() {
    let source = "void f(int n) {\n\
                  \tswitch (n) {\n\
                  \tcase 0:\n\
                  \t\tn = 1;\n\
                  \t\tbreak;\n\
                  \tcase 1:\n\
                  \tdefault:\n\
                  \t\tbreak;\n\
                  \t}\n\
                  }";
    let program = parse_ok(source);
    let stmt = single_body_stmt(&program);
    match &stmt.kind {
        StmtKind::Switch { cases, .. } => {
            assert_eq!(cases.len(), 3);
            assert_eq!(cases[0].stmts.len(), 2);
            assert!(cases[1].stmts.is_empty());
            assert!(cases[2].expr.is_none());
        }
        other => panic!("expected switch statement, got {:?}", other),
    }
}

#[test]
fn test_comment_attached_to_statement() {
    let program = parse_ok("// world transform\nfloat4x4 wvp;");
    let stmts = user_stmts(&program);
    assert_eq!(stmts[0].comment.as_deref(), Some("world transform"));
}

#[test]
fn test_sampler_state_dx9_block() {
    let source = "sampler2D samp = sampler_state {\n\
                  \ttexture = <colorMap>;\n\
                  \tFilter = MIN_MAG_MIP_LINEAR;\n\
                  \tAddressU = CLAMP;\n\
                  };";
    let program = parse_ok(source);
    let stmts = user_stmts(&program);
    match &stmts[0].kind {
        StmtKind::SamplerDecl(decl) => {
            let sampler = &decl.sampler_decls[0];
            assert_eq!(sampler.ident, "samp");
            assert_eq!(sampler.texture_ident.as_deref(), Some("colorMap"));
            assert_eq!(sampler.sampler_values.len(), 2);
            assert_eq!(sampler.sampler_values[0].name, "Filter");
        }
        other => panic!("expected sampler declaration, got {:?}", other),
    }
}

#[test]
fn test_sampler_state_dx10_body() {
    let source = "SamplerState samp { Filter = MIN_MAG_MIP_LINEAR; AddressU = CLAMP; };";
    let program = parse_ok(source);
    let stmts = user_stmts(&program);
    match &stmts[0].kind {
        StmtKind::SamplerDecl(decl) => {
            assert_eq!(decl.sampler_decls[0].sampler_values.len(), 2);
        }
        other => panic!("expected sampler declaration, got {:?}", other),
    }
}

#[test]
fn test_numthreads_attribute() {
    let source = "[numthreads(8, 8, 1)]\nvoid main(uint3 id : SV_DispatchThreadID) { }";
    let program = parse_ok(source);
    let stmts = user_stmts(&program);
    match &stmts[0].kind {
        StmtKind::FunctionDecl(decl) => {
            assert_eq!(decl.attribs.len(), 1);
            assert_eq!(decl.attribs[0].ident, "numthreads");
            assert_eq!(decl.attribs[0].arguments.len(), 3);
        }
        other => panic!("expected function declaration, got {:?}", other),
    }
}

#[test]
fn test_initializer_list() {
    let program = parse_ok("void f() { float a[3] = { 1.0, 2.0, 3.0 }; }");
    let stmt = single_body_stmt(&program);
    match &stmt.kind {
        StmtKind::VarDecl(decl) => {
            let initializer = decl.var_decls[0].initializer.as_ref().unwrap();
            match &initializer.kind {
                ExprKind::Initializer(exprs) => assert_eq!(exprs.len(), 3),
                other => panic!("expected initializer list, got {:?}", other),
            }
        }
        other => panic!("expected variable declaration, got {:?}", other),
    }
}

#[test]
fn test_for_loop_with_attributes() {
    let source = "void f() { [unroll] for (int i = 0; i < 4; i++) { } }";
    let program = parse_ok(source);
    let stmt = single_body_stmt(&program);
    match &stmt.kind {
        StmtKind::For { attribs, .. } => {
            assert_eq!(attribs.len(), 1);
            assert_eq!(attribs[0].ident, "unroll");
        }
        other => panic!("expected for statement, got {:?}", other),
    }
}

#[test]
fn test_typedef_registers_for_later_statements() {
    // 'Vec' must be usable as a statement-leading type name.
    let program = parse_ok("typedef float3 Vec;\nvoid f() { Vec v; }");
    let stmt = single_body_stmt(&program);
    match &stmt.kind {
        StmtKind::VarDecl(decl) => {
            assert_eq!(
                decl.var_type.type_denoter,
                TypeDenoter::Alias("Vec".to_string())
            );
        }
        other => panic!("expected variable declaration, got {:?}", other),
    }
}

#[test]
fn test_missing_semicolon_is_error() {
    assert!(parse_err("float x") >= 1);
}

#[test]
fn test_unbalanced_brace_is_error() {
    assert!(parse_err("void f() { int x = 0;") >= 1);
}

#[test]
fn test_multiple_var_decls_in_one_stmt() {
    let program = parse_ok("float a, b = 1.0, c[2];");
    let stmts = user_stmts(&program);
    match &stmts[0].kind {
        StmtKind::VarDecl(decl) => {
            assert_eq!(decl.var_decls.len(), 3);
            assert_eq!(decl.var_decls[0].ident, "a");
            assert!(decl.var_decls[1].initializer.is_some());
            assert_eq!(decl.var_decls[2].array_dims.len(), 1);
        }
        other => panic!("expected variable declaration, got {:?}", other),
    }
}
