use crate::analyzer::Analyzer;
use crate::ast::*;
use crate::intrinsics::Intrinsic;
use crate::parser::parse_source;
use crate::report::{Log, Report, ReportHandler, Severity};
use crate::ty::{DataType, ScalarType};
use crate::{
    ComparisonFunc, InputShaderVersion, SamplerFilter, ShaderTarget, Statistics,
    TextureAddressMode,
};

#[derive(Default)]
struct CollectLog(Vec<Report>);

impl Log for CollectLog {
    fn submit_report(&mut self, report: &Report) {
        self.0.push(report.clone());
    }
}

struct AnalysisResult {
    program: Program,
    success: bool,
    reports: Vec<Report>,
    statistics: Statistics,
}

fn analyze(source: &str, entry: &str, target: ShaderTarget) -> AnalysisResult {
    analyze_with(source, entry, target, InputShaderVersion::Hlsl5, true)
}

fn analyze_with(
    source: &str,
    entry: &str,
    target: ShaderTarget,
    version: InputShaderVersion,
    prefer_wrappers: bool,
) -> AnalysisResult {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut log = CollectLog::default();
    let mut statistics = Statistics::default();
    let mut program = None;
    let mut success = false;
    {
        let mut reports = ReportHandler::new(Some(&mut log));
        if let Some(mut parsed) = parse_source(source, "test.hlsl", &mut reports) {
            let analyzer = Analyzer::new(
                entry,
                target,
                version,
                prefer_wrappers,
                Some(&mut statistics),
                &mut reports,
            );
            success = analyzer.decorate(&mut parsed);
            program = Some(parsed);
        }
    }
    AnalysisResult {
        program: program.unwrap_or_else(|| panic!("parse failed for source:\n{}", source)),
        success,
        reports: log.0,
        statistics,
    }
}

fn errors(result: &AnalysisResult) -> Vec<&Report> {
    result
        .reports
        .iter()
        .filter(|r| r.severity == Severity::Error)
        .collect()
}

fn warnings(result: &AnalysisResult) -> Vec<&Report> {
    result
        .reports
        .iter()
        .filter(|r| r.severity == Severity::Warning)
        .collect()
}

/// Finds the first function call in the program matching a predicate.
fn find_call<'a>(program: &'a Program, pred: &dyn Fn(&FunctionCall) -> bool) -> Option<&'a FunctionCall> {
    fn in_stmt<'a>(stmt: &'a Stmt, pred: &dyn Fn(&FunctionCall) -> bool) -> Option<&'a FunctionCall> {
        match &stmt.kind {
            StmtKind::FunctionDecl(decl) => {
                let block = decl.code_block.as_ref()?;
                block.stmts.iter().find_map(|s| in_stmt(s, pred))
            }
            StmtKind::CodeBlock(block) => block.stmts.iter().find_map(|s| in_stmt(s, pred)),
            StmtKind::Expr(expr) => in_expr(expr, pred),
            StmtKind::Return(Some(expr)) => in_expr(expr, pred),
            StmtKind::VarDecl(decl) => decl
                .var_decls
                .iter()
                .filter_map(|v| v.initializer.as_ref())
                .find_map(|e| in_expr(e, pred)),
            StmtKind::If { condition, body, else_stmt, .. } => in_expr(condition, pred)
                .or_else(|| in_stmt(body, pred))
                .or_else(|| else_stmt.as_ref().and_then(|e| in_stmt(&e.body, pred))),
            _ => None,
        }
    }

    fn in_expr<'a>(expr: &'a Expr, pred: &dyn Fn(&FunctionCall) -> bool) -> Option<&'a FunctionCall> {
        match &expr.kind {
            ExprKind::Call(call) => {
                if pred(call) {
                    return Some(call);
                }
                call.arguments.iter().find_map(|a| in_expr(a, pred))
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                in_expr(lhs, pred).or_else(|| in_expr(rhs, pred))
            }
            ExprKind::Unary { expr, .. }
            | ExprKind::PostUnary { expr, .. }
            | ExprKind::Bracket(expr)
            | ExprKind::Cast { expr, .. }
            | ExprKind::Suffix { expr, .. } => in_expr(expr, pred),
            ExprKind::VarAccess(access) => {
                access.assign_expr.as_ref().and_then(|e| in_expr(e, pred))
            }
            _ => None,
        }
    }

    program.global_stmts.iter().find_map(|s| in_stmt(s, pred))
}

const VERTEX_PASSTHROUGH: &str =
    "float4 main(float3 pos : POSITION) : SV_Position { return float4(pos, 1.0); }";

#[test]
fn test_minimal_vertex_shader_analyzes() {
    let result = analyze(VERTEX_PASSTHROUGH, "main", ShaderTarget::Vertex);
    assert!(result.success, "analysis failed: {:?}", result.reports);

    let entry = result.program.entry_point.as_ref().expect("entry point info");
    assert_eq!(entry.ident, "main");
    assert_eq!(entry.inputs.len(), 1);
    assert_eq!(entry.inputs[0].ident, "pos");
    assert_eq!(entry.outputs.len(), 1);
}

#[test]
fn test_missing_entry_point_is_error() {
    let result = analyze(VERTEX_PASSTHROUGH, "mainVS", ShaderTarget::Vertex);
    assert!(!result.success);
    assert!(errors(&result)
        .iter()
        .any(|r| r.message.contains("entry point 'mainVS' not found")));
}

#[test]
fn test_undeclared_identifier_in_call() {
    let source = "float4 main() : SV_Position { return missing_func(); }";
    let result = analyze(source, "main", ShaderTarget::Vertex);
    assert!(!result.success);
    let errors = errors(&result);
    let report = errors
        .iter()
        .find(|r| r.message.contains("undeclared identifier 'missing_func'"))
        .expect("undeclared identifier report");
    // The diagnostic carries the call's source area.
    assert_eq!(report.file, "test.hlsl");
    assert_eq!(report.row, 1);
    assert!(report.col > 0);
}

#[test]
fn test_overload_resolution_prefers_exact_match() {
    let source = "float pick(int n) { return 1.0; }\n\
                  float pick(float n) { return 2.0; }\n\
                  float4 main() : SV_Position { return float4(0, 0, 0, pick(1)); }";
    let result = analyze(source, "main", ShaderTarget::Vertex);
    assert!(result.success, "analysis failed: {:?}", result.reports);
}

#[test]
fn test_overload_resolution_ambiguity_is_hard_error() {
    // 'bool' converts to both candidates equally well.
    let source = "float pick(int n) { return 1.0; }\n\
                  float pick(float n) { return 2.0; }\n\
                  float4 main() : SV_Position { return float4(0, 0, 0, pick(true)); }";
    let result = analyze(source, "main", ShaderTarget::Vertex);
    assert!(!result.success);
    assert!(errors(&result)
        .iter()
        .any(|r| r.message.contains("ambiguous call to function 'pick'")));
}

#[test]
fn test_duplicate_function_definition_is_error() {
    let source = "float f(int n) { return 1.0; }\n\
                  float f(int n) { return 2.0; }\n\
                  float4 main() : SV_Position { return (float4)0; }";
    let result = analyze(source, "main", ShaderTarget::Vertex);
    assert!(!result.success);
}

#[test]
fn test_intrinsic_overload_upgrades() {
    let source = "Texture2D tex;\nSamplerState samp;\n\
                  float4 main(float2 uv : TEXCOORD0) : SV_Target {\n\
                  \tfloat4 a = tex.Sample(samp, uv);\n\
                  \tfloat4 b = tex.Sample(samp, uv, int2(1, 1));\n\
                  \tfloat4 c = tex.SampleLevel(samp, uv, 2.0);\n\
                  \tfloat4 d = tex.SampleLevel(samp, uv, 2.0, int2(0, 0));\n\
                  \tfloat4 e = tex.Load(int3(0, 0, 0));\n\
                  \tuint f = asuint(1.0);\n\
                  \treturn a + b + c + d + e;\n\
                  }";
    let result = analyze(source, "main", ShaderTarget::Fragment);
    assert!(result.success, "analysis failed: {:?}", result.reports);

    let with_args = |n: usize, intr: Intrinsic| {
        find_call(&result.program, &move |call: &FunctionCall| {
            call.intrinsic == Some(intr) && call.arguments.len() == n
        })
        .is_some()
    };
    assert!(with_args(2, Intrinsic::TextureSample2));
    assert!(with_args(3, Intrinsic::TextureSample3));
    assert!(with_args(3, Intrinsic::TextureSampleLevel3));
    assert!(with_args(4, Intrinsic::TextureSampleLevel4));
    assert!(with_args(1, Intrinsic::TextureLoad1));
    assert!(with_args(1, Intrinsic::AsUInt1));
}

#[test]
fn test_intrinsic_below_shader_model_warns() {
    let source = "Texture2D tex;\nSamplerState samp;\n\
                  float4 main(float2 uv : TEXCOORD0) : SV_Target {\n\
                  \treturn tex.Sample(samp, uv);\n\
                  }";
    let result = analyze_with(
        source,
        "main",
        ShaderTarget::Fragment,
        InputShaderVersion::Hlsl3,
        true,
    );
    assert!(result.success);
    assert!(warnings(&result)
        .iter()
        .any(|r| r.message.contains("requires shader model 4.0")));
}

#[test]
fn test_non_texture_intrinsic_on_texture_object() {
    let source = "Texture2D tex;\n\
                  float4 main() : SV_Target { return tex.normalize(); }";
    let result = analyze(source, "main", ShaderTarget::Fragment);
    assert!(!result.success);
    assert!(errors(&result)
        .iter()
        .any(|r| r.message.contains("invalid intrinsic 'normalize' for a texture object")));
}

#[test]
fn test_entry_point_struct_flattening() {
    let source = "struct VertexIn {\n\
                  \tfloat4 pos : SV_Position;\n\
                  \tfloat2 uv : TEXCOORD0;\n\
                  };\n\
                  float4 main(VertexIn v) : SV_Target { return float4(v.uv, 0, 1); }";
    let result = analyze(source, "main", ShaderTarget::Fragment);
    assert!(result.success, "analysis failed: {:?}", result.reports);

    let entry = result.program.entry_point.as_ref().expect("entry point info");
    // Each member produces exactly one input binding.
    assert_eq!(entry.inputs.len(), 2);
    assert_eq!(entry.inputs[0].ident, "pos");
    assert!(entry.inputs[0].flags.has(Flags::IS_SYSTEM_VALUE));
    assert_eq!(entry.inputs[1].ident, "uv");
    assert!(!entry.inputs[1].flags.has(Flags::IS_SYSTEM_VALUE));

    // The structure itself is marked as shader input.
    let is_input_struct = result.program.global_stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::StructDecl(decl) => decl.struct_decl.flags.has(Flags::IS_SHADER_INPUT),
        _ => false,
    });
    assert!(is_input_struct);
}

#[test]
fn test_semantic_remap_depends_on_stage() {
    // Vertex stage: SV_Position becomes the internal vertex position.
    let result = analyze(VERTEX_PASSTHROUGH, "main", ShaderTarget::Vertex);
    let entry = result.program.entry_point.as_ref().unwrap();
    assert_eq!(
        entry.outputs[0].semantic.system_value(),
        Some(SystemValue::VertexPosition)
    );

    // Fragment stage: SV_Position stays and flags the fragment coordinate.
    let source = "float4 main(float4 coord : SV_Position) : SV_Target { return coord; }";
    let result = analyze(source, "main", ShaderTarget::Fragment);
    assert!(result.success);
    let entry = result.program.entry_point.as_ref().unwrap();
    assert_eq!(
        entry.inputs[0].semantic.system_value(),
        Some(SystemValue::Position)
    );
    assert!(result.program.flags.has(Flags::IS_FRAG_COORD_USED));
}

#[test]
fn test_sm3_fragment_screen_space_flag() {
    let source = "float4 main(float2 uv : TEXCOORD0) : SV_Target { return float4(uv, 0, 1); }";
    let result = analyze_with(
        source,
        "main",
        ShaderTarget::Fragment,
        InputShaderVersion::Hlsl3,
        true,
    );
    assert!(result.success);
    assert!(result.program.flags.has(Flags::HAS_SM3_SCREEN_SPACE));

    let result = analyze(source, "main", ShaderTarget::Fragment);
    assert!(!result.program.flags.has(Flags::HAS_SM3_SCREEN_SPACE));
}

#[test]
fn test_cyclic_typedef_is_semantic_error() {
    let source = "typedef A B;\ntypedef B A;\nfloat4 main() : SV_Position { return (float4)0; }";
    let result = analyze(source, "main", ShaderTarget::Vertex);
    // Must terminate with an error, not hang.
    assert!(!result.success);
}

#[test]
fn test_alias_chain_resolves_through_layers() {
    let source = "typedef float4 Color;\ntypedef Color Albedo;\n\
                  Albedo tint;\n\
                  float4 main() : SV_Position { return tint; }";
    let result = analyze(source, "main", ShaderTarget::Vertex);
    assert!(result.success, "analysis failed: {:?}", result.reports);
}

#[test]
fn test_invalid_cast_is_error() {
    let source = "struct S { int a; };\n\
                  float4 main() : SV_Position {\n\
                  \tS s;\n\
                  \tfloat f = s;\n\
                  \treturn (float4)0;\n\
                  }";
    let result = analyze(source, "main", ShaderTarget::Vertex);
    assert!(!result.success);
    let errors = errors(&result);
    let report = errors
        .iter()
        .find(|r| r.message.contains("can not cast"))
        .expect("cast error report");
    assert_eq!(report.code.as_deref(), Some("invalid-cast"));
}

#[test]
fn test_nested_named_struct_is_error() {
    let source = "struct Outer { struct Inner { int a; } member; };\n\
                  float4 main() : SV_Position { return (float4)0; }";
    let result = analyze(source, "main", ShaderTarget::Vertex);
    assert!(!result.success);
    assert!(errors(&result)
        .iter()
        .any(|r| r.message.contains("nested structures must be anonymous")));
}

#[test]
fn test_struct_member_through_inheritance() {
    let source = "struct Base { float4 color : COLOR0; };\n\
                  struct Derived : Base { float2 uv : TEXCOORD0; };\n\
                  float4 main(Derived v) : SV_Target { return v.color; }";
    let result = analyze(source, "main", ShaderTarget::Fragment);
    assert!(result.success, "analysis failed: {:?}", result.reports);
}

#[test]
fn test_buffer_bound_to_multiple_slots_is_error() {
    let source = "cbuffer Settings : register(b0) : register(b1) { float4 tint; }\n\
                  float4 main() : SV_Position { return tint; }";
    let result = analyze(source, "main", ShaderTarget::Vertex);
    assert!(!result.success);
    assert!(errors(&result)
        .iter()
        .any(|r| r.message.contains("buffers can only be bound to one slot")));
}

#[test]
fn test_sampler_state_statistics() {
    let source = "SamplerState samp {\n\
                  \tFilter = MIN_MAG_MIP_LINEAR;\n\
                  \tAddressU = CLAMP;\n\
                  \tAddressV = WRAP;\n\
                  \tComparisonFunc = COMPARISON_LESS;\n\
                  \tMipLODBias = 0.5;\n\
                  \tMaxAnisotropy = 4;\n\
                  };\n\
                  float4 main() : SV_Position { return (float4)0; }";
    let result = analyze(source, "main", ShaderTarget::Vertex);
    assert!(result.success, "analysis failed: {:?}", result.reports);

    let state = result
        .statistics
        .sampler_states
        .get("samp")
        .expect("sampler state entry");
    assert_eq!(state.filter, SamplerFilter::MinMagMipLinear);
    assert_eq!(state.address_u, TextureAddressMode::Clamp);
    assert_eq!(state.address_v, TextureAddressMode::Wrap);
    assert_eq!(state.comparison_func, ComparisonFunc::Less);
    assert_eq!(state.mip_lod_bias, 0.5);
    assert_eq!(state.max_anisotropy, 4);
}

#[test]
fn test_unknown_sampler_state_key_warns() {
    let source = "SamplerState samp { Frobnicate = 4; };\n\
                  float4 main() : SV_Position { return (float4)0; }";
    let result = analyze(source, "main", ShaderTarget::Vertex);
    assert!(result.success);
    assert!(warnings(&result)
        .iter()
        .any(|r| r.message.contains("unknown sampler state 'Frobnicate'")));
}

#[test]
fn test_border_color_forms() {
    let source = "SamplerState a { BorderColor = float4(1.0, 0.5, 0.25, 0.0); };\n\
                  SamplerState b { BorderColor = (float4)0.5; };\n\
                  SamplerState c { BorderColor = { 0.1, 0.2, 0.3, 0.4 }; };\n\
                  float4 main() : SV_Position { return (float4)0; }";
    let result = analyze(source, "main", ShaderTarget::Vertex);
    assert!(result.success, "analysis failed: {:?}", result.reports);

    let state = |name: &str| result.statistics.sampler_states.get(name).unwrap().clone();
    assert_eq!(state("a").border_color, [1.0, 0.5, 0.25, 0.0]);
    assert_eq!(state("b").border_color, [0.5; 4]);
    assert_eq!(state("c").border_color, [0.1, 0.2, 0.3, 0.4]);
}

#[test]
fn test_texture_bindings_in_statistics() {
    let source = "Texture2D diffuse : register(t1);\n\
                  Texture2D normals : register(t0);\n\
                  float4 main() : SV_Position { return (float4)0; }";
    let result = analyze(source, "main", ShaderTarget::Vertex);
    assert!(result.success);
    // Collection order is declaration order; the compile entry point sorts
    // by location afterwards.
    assert_eq!(result.statistics.textures.len(), 2);
    assert_eq!(result.statistics.textures[0].ident, "diffuse");
    assert_eq!(result.statistics.textures[0].location, 1);
}

#[test]
fn test_end_of_function_return_is_marked() {
    let result = analyze(VERTEX_PASSTHROUGH, "main", ShaderTarget::Vertex);
    let marked = result.program.global_stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::FunctionDecl(decl) => decl
            .code_block
            .as_ref()
            .and_then(|block| block.stmts.last())
            .map(|last| last.flags.has(Flags::IS_END_OF_FUNCTION))
            .unwrap_or(false),
        _ => false,
    });
    assert!(marked);
}

#[test]
fn test_clip_inlining_flag_depends_on_wrapper_preference() {
    let source = "float4 main(float2 uv : TEXCOORD0) : SV_Target {\n\
                  \tclip(uv.x);\n\
                  \tclip(uv);\n\
                  \treturn float4(1, 1, 1, 1);\n\
                  }";

    let inline = analyze_with(source, "main", ShaderTarget::Fragment, InputShaderVersion::Hlsl5, false);
    let scalar_clip = find_call(&inline.program, &|call: &FunctionCall| {
        call.intrinsic == Some(Intrinsic::Clip)
            && call.intrinsic_arg_type == Some(DataType::Scalar(ScalarType::Float))
    })
    .expect("scalar clip call");
    assert!(scalar_clip.flags.has(Flags::CAN_INLINE_INTRINSIC_WRAPPER));

    // The vector argument's resolved type is recorded so the emitter can
    // pick the component-wise comparison, and inlining still applies.
    let vector_clip = find_call(&inline.program, &|call: &FunctionCall| {
        call.intrinsic == Some(Intrinsic::Clip)
            && call.intrinsic_arg_type == Some(DataType::Vector(ScalarType::Float, 2))
    })
    .expect("vector clip call");
    assert!(vector_clip.flags.has(Flags::CAN_INLINE_INTRINSIC_WRAPPER));

    let wrapped = analyze_with(source, "main", ShaderTarget::Fragment, InputShaderVersion::Hlsl5, true);
    let call = find_call(&wrapped.program, &|call: &FunctionCall| {
        call.intrinsic == Some(Intrinsic::Clip)
    })
    .expect("clip call");
    assert!(!call.flags.has(Flags::CAN_INLINE_INTRINSIC_WRAPPER));
}

#[test]
fn test_output_struct_alias_disables_codegen() {
    let source = "struct VOut { float4 pos : SV_Position; float2 uv : TEXCOORD0; };\n\
                  VOut main(float3 p : POSITION, float2 t : TEXCOORD0) {\n\
                  \tVOut o;\n\
                  \to.pos = float4(p, 1.0);\n\
                  \to.uv = t;\n\
                  \treturn o;\n\
                  }";
    let result = analyze(source, "main", ShaderTarget::Vertex);
    assert!(result.success, "analysis failed: {:?}", result.reports);

    let entry = result.program.entry_point.as_ref().unwrap();
    assert_eq!(entry.output_alias.as_deref(), Some("o"));
    assert_eq!(entry.return_struct.as_deref(), Some("VOut"));
    assert_eq!(entry.outputs.len(), 2);

    // The local declaration of 'o' is excluded from code generation.
    let disabled = result.program.global_stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::FunctionDecl(decl) => decl
            .code_block
            .as_ref()
            .map(|block| {
                block.stmts.iter().any(|s| match &s.kind {
                    StmtKind::VarDecl(decl) => decl
                        .var_decls
                        .iter()
                        .any(|v| v.ident == "o" && v.flags.has(Flags::DISABLE_CODEGEN)),
                    _ => false,
                })
            })
            .unwrap_or(false),
        _ => false,
    });
    assert!(disabled);
}

#[test]
fn test_var_ident_symbols_are_decorated() {
    let result = analyze(VERTEX_PASSTHROUGH, "main", ShaderTarget::Vertex);
    let call = find_call(&result.program, &|call: &FunctionCall| {
        call.type_denoter.is_some()
    })
    .expect("constructor call");
    match &call.arguments[0].kind {
        ExprKind::VarAccess(access) => {
            assert_eq!(access.var_ident.symbol, Some(SymbolKind::Variable));
        }
        other => panic!("expected variable access, got {:?}", other),
    }
}
