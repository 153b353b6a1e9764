use crate::report::{Log, Report, Severity};
use crate::{
    compile_shader, IncludeError, IncludeHandler, InputShaderVersion, Options,
    OutputShaderVersion, SamplerFilter, ShaderInput, ShaderOutput, ShaderTarget, Statistics,
    TextureAddressMode,
};
use std::collections::HashMap;

#[derive(Default)]
struct CollectLog(Vec<Report>);

impl Log for CollectLog {
    fn submit_report(&mut self, report: &Report) {
        self.0.push(report.clone());
    }
}

struct MapIncludeHandler(HashMap<String, String>);

impl IncludeHandler for MapIncludeHandler {
    fn include(
        &mut self,
        filename: &str,
        _use_search_paths: bool,
    ) -> Result<String, IncludeError> {
        self.0
            .get(filename)
            .cloned()
            .ok_or_else(|| IncludeError::NotFound(filename.to_string()))
    }
}

struct CompileResult {
    success: bool,
    code: String,
    reports: Vec<Report>,
    statistics: Statistics,
}

fn compile(
    source: &str,
    entry: &str,
    target: ShaderTarget,
    version: OutputShaderVersion,
    options: Options,
) -> CompileResult {
    compile_full(source, entry, target, InputShaderVersion::Hlsl5, version, options, None)
}

fn compile_full(
    source: &str,
    entry: &str,
    target: ShaderTarget,
    input_version: InputShaderVersion,
    output_version: OutputShaderVersion,
    options: Options,
    includes: Option<HashMap<String, String>>,
) -> CompileResult {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut log = CollectLog::default();
    let mut statistics = Statistics::default();
    let mut buffer = Vec::new();
    let mut include_handler = MapIncludeHandler(includes.unwrap_or_default());

    let success = {
        let input = ShaderInput {
            source,
            filename: "shader.hlsl".to_string(),
            entry_point: entry.to_string(),
            shader_target: target,
            shader_version: input_version,
            include_handler: Some(&mut include_handler),
        };
        let mut output = ShaderOutput {
            code: &mut buffer,
            shader_version: output_version,
            options,
            statistics: Some(&mut statistics),
        };
        compile_shader(input, &mut output, Some(&mut log))
    };

    CompileResult {
        success,
        code: String::from_utf8(buffer).expect("output is UTF-8"),
        reports: log.0,
        statistics,
    }
}

const VERTEX_PASSTHROUGH: &str =
    "float4 main(float3 pos : POSITION) : SV_Position { return float4(pos, 1.0); }";

#[test]
fn test_minimal_vertex_shader_to_glsl150() {
    let result = compile(
        VERTEX_PASSTHROUGH,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl150,
        Options::default(),
    );
    assert!(result.success, "compile failed: {:?}", result.reports);
    assert!(result.code.contains("#version 150"), "code:\n{}", result.code);
    assert!(result.code.contains("in vec3 pos;"), "code:\n{}", result.code);
    assert!(result.code.contains("void main()"), "code:\n{}", result.code);
    assert!(
        result.code.contains("gl_Position = vec4(pos, 1.0);"),
        "code:\n{}",
        result.code
    );
}

#[test]
fn test_clip_inline_vs_wrapper() {
    let source = "float4 main(float2 uv : TEXCOORD0) : SV_Target {\n\
                  \tclip(uv.x);\n\
                  \tclip(uv);\n\
                  \treturn float4(1, 1, 1, 1);\n\
                  }";

    let mut inline_options = Options::default();
    inline_options.prefer_wrappers = false;
    let inline = compile(
        source,
        "main",
        ShaderTarget::Fragment,
        OutputShaderVersion::Glsl330,
        inline_options,
    );
    assert!(inline.success, "compile failed: {:?}", inline.reports);
    assert!(
        inline.code.contains("if (uv.x < 0.0)"),
        "code:\n{}",
        inline.code
    );
    // Vector arguments use the component-wise comparison; '<' would not
    // compile in GLSL.
    assert!(
        inline.code.contains("if (any(lessThan(uv, vec2(0.0))))"),
        "code:\n{}",
        inline.code
    );
    assert!(inline.code.contains("discard;"), "code:\n{}", inline.code);
    assert!(
        !inline.code.contains("void clip(float x)"),
        "code:\n{}",
        inline.code
    );

    let wrapped = compile(
        source,
        "main",
        ShaderTarget::Fragment,
        OutputShaderVersion::Glsl330,
        Options::default(),
    );
    assert!(wrapped.success, "compile failed: {:?}", wrapped.reports);
    assert!(
        wrapped.code.contains("void clip(float x)"),
        "code:\n{}",
        wrapped.code
    );
    assert!(
        wrapped.code.contains("void clip(vec2 x)"),
        "code:\n{}",
        wrapped.code
    );
    assert!(
        wrapped.code.contains("clip(uv.x);"),
        "code:\n{}",
        wrapped.code
    );
    assert!(
        wrapped.code.contains("clip(uv);"),
        "code:\n{}",
        wrapped.code
    );
}

#[test]
fn test_compute_shader_with_numthreads_and_buffer() {
    let source = "Buffer<float4> data : register(t0);\n\
                  [numthreads(8, 8, 1)]\n\
                  void main(uint3 id : SV_DispatchThreadID) {\n\
                  \tfloat4 value = data.Load(id.x);\n\
                  }";
    let result = compile(
        source,
        "main",
        ShaderTarget::Compute,
        OutputShaderVersion::Glsl430,
        Options::default(),
    );
    assert!(result.success, "compile failed: {:?}", result.reports);
    assert!(
        result
            .code
            .contains("layout(local_size_x = 8, local_size_y = 8, local_size_z = 1) in;"),
        "code:\n{}",
        result.code
    );
    assert!(result.code.contains("buffer"), "code:\n{}", result.code);
    assert!(result.code.contains("vec4 data[];"), "code:\n{}", result.code);
    assert!(
        result.code.contains("data[gl_GlobalInvocationID.x]"),
        "code:\n{}",
        result.code
    );
}

#[test]
fn test_sampler_state_populates_statistics() {
    let source = "SamplerState samp { Filter = MIN_MAG_MIP_LINEAR; AddressU = CLAMP; };\n\
                  float4 main() : SV_Position { return (float4)0; }";
    let mut options = Options::default();
    options.show_stat = true;
    let result = compile(
        source,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl330,
        options,
    );
    assert!(result.success, "compile failed: {:?}", result.reports);

    let state = result
        .statistics
        .sampler_states
        .get("samp")
        .expect("sampler state entry");
    assert_eq!(state.filter, SamplerFilter::MinMagMipLinear);
    assert_eq!(state.address_u, TextureAddressMode::Clamp);
}

#[test]
fn test_cyclic_typedef_fails_without_hanging() {
    let source = "typedef A B;\ntypedef B A;\n";
    let result = compile(
        source,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl330,
        Options::default(),
    );
    assert!(!result.success);
    assert!(result
        .reports
        .iter()
        .any(|r| r.severity == Severity::Error));
}

#[test]
fn test_undeclared_identifier_reports_call_area() {
    let source = "float4 main() : SV_Position {\n\treturn nonexistent();\n}";
    let result = compile(
        source,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl330,
        Options::default(),
    );
    assert!(!result.success);
    let report = result
        .reports
        .iter()
        .find(|r| r.message.contains("undeclared identifier 'nonexistent'"))
        .expect("undeclared identifier report");
    assert_eq!(report.file, "shader.hlsl");
    assert_eq!(report.row, 2);
}

#[test]
fn test_glsl_120_output_is_config_error() {
    let result = compile(
        VERTEX_PASSTHROUGH,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl120,
        Options::default(),
    );
    assert!(!result.success);
    assert!(result
        .reports
        .iter()
        .any(|r| r.message.contains("'GLSL 1.20' is not supported")));
}

#[test]
fn test_compile_is_deterministic() {
    let source = "Texture2D tex : register(t1);\n\
                  Texture2D other : register(t0);\n\
                  SamplerState samp;\n\
                  float4 main(float2 uv : TEXCOORD0) : SV_Target {\n\
                  \treturn tex.Sample(samp, uv) + other.Sample(samp, uv);\n\
                  }";
    let first = compile(
        source,
        "main",
        ShaderTarget::Fragment,
        OutputShaderVersion::Glsl450,
        Options::default(),
    );
    let second = compile(
        source,
        "main",
        ShaderTarget::Fragment,
        OutputShaderVersion::Glsl450,
        Options::default(),
    );
    assert!(first.success, "compile failed: {:?}", first.reports);
    assert_eq!(first.code, second.code);
    assert_eq!(first.statistics, second.statistics);

    // Bindings are sorted by location.
    assert_eq!(first.statistics.textures[0].ident, "other");
    assert_eq!(first.statistics.textures[1].ident, "tex");
}

#[test]
fn test_line_directive_fidelity_across_includes() {
    // The undeclared identifier lives on row 2 of the included file; the
    // diagnostic must reference that position, not the expanded stream.
    let mut includes = HashMap::new();
    includes.insert(
        "common.hlsli".to_string(),
        "float4 goodColor;\nfloat4 badColor = missing_variable;\n".to_string(),
    );
    let source = "#include \"common.hlsli\"\n\
                  float4 main() : SV_Position { return goodColor; }";
    let result = compile_full(
        source,
        "main",
        ShaderTarget::Vertex,
        InputShaderVersion::Hlsl5,
        OutputShaderVersion::Glsl330,
        Options::default(),
        Some(includes),
    );
    assert!(!result.success);
    let report = result
        .reports
        .iter()
        .find(|r| r.message.contains("undeclared identifier 'missing_variable'"))
        .expect("undeclared identifier report");
    assert_eq!(report.file, "common.hlsli");
    assert_eq!(report.row, 2);
}

#[test]
fn test_preprocess_only_copies_expanded_source() {
    let source = "#define RADIUS 4\nfloat r = RADIUS;\n";
    let mut options = Options::default();
    options.preprocess_only = true;
    let result = compile(
        source,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl330,
        options,
    );
    assert!(result.success, "compile failed: {:?}", result.reports);
    assert!(result.code.contains("float r = 4;"));
    assert!(!result.code.contains("#define"));
}

#[test]
fn test_validate_only_discards_output() {
    let mut options = Options::default();
    options.validate_only = true;
    let result = compile(
        VERTEX_PASSTHROUGH,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl330,
        options,
    );
    assert!(result.success, "compile failed: {:?}", result.reports);
    assert!(result.code.is_empty());
}

#[test]
fn test_struct_io_flattening_end_to_end() {
    let source = "struct VOut {\n\
                  \tfloat4 pos : SV_Position;\n\
                  \tfloat2 uv : TEXCOORD0;\n\
                  };\n\
                  VOut main(float3 p : POSITION, float2 t : TEXCOORD0) {\n\
                  \tVOut o;\n\
                  \to.pos = float4(p, 1.0);\n\
                  \to.uv = t;\n\
                  \treturn o;\n\
                  }";
    let result = compile(
        source,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl150,
        Options::default(),
    );
    assert!(result.success, "compile failed: {:?}", result.reports);
    assert!(result.code.contains("in vec3 p;"), "code:\n{}", result.code);
    assert!(result.code.contains("in vec2 t;"), "code:\n{}", result.code);
    assert!(result.code.contains("out vec2 uv;"), "code:\n{}", result.code);
    // The struct itself is flattened away.
    assert!(!result.code.contains("struct VOut"), "code:\n{}", result.code);
    // Writes through the aliased output variable go to the interface.
    assert!(
        result.code.contains("gl_Position = vec4(p, 1.0);"),
        "code:\n{}",
        result.code
    );
    assert!(result.code.contains("uv = t;"), "code:\n{}", result.code);
}

#[test]
fn test_cbuffer_becomes_uniform_block() {
    let source = "cbuffer PerFrame : register(b0) {\n\
                  \tfloat4x4 worldViewProj;\n\
                  }\n\
                  float4 main(float3 pos : POSITION) : SV_Position {\n\
                  \treturn mul(worldViewProj, float4(pos, 1.0));\n\
                  }";
    let result = compile(
        source,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl330,
        Options::default(),
    );
    assert!(result.success, "compile failed: {:?}", result.reports);
    assert!(
        result.code.contains("layout(std140) uniform PerFrame"),
        "code:\n{}",
        result.code
    );
    assert!(result.code.contains("mat4 worldViewProj;"), "code:\n{}", result.code);
    // mul() lowers to the multiplication operator.
    assert!(
        result.code.contains("(worldViewProj) * (vec4(pos, 1.0))"),
        "code:\n{}",
        result.code
    );
}

#[test]
fn test_texture_sample_emission() {
    let source = "Texture2D tex : register(t0);\nSamplerState samp : register(s0);\n\
                  float4 main(float2 uv : TEXCOORD0) : SV_Target {\n\
                  \treturn tex.Sample(samp, uv);\n\
                  }";
    let result = compile(
        source,
        "main",
        ShaderTarget::Fragment,
        OutputShaderVersion::Glsl450,
        Options::default(),
    );
    assert!(result.success, "compile failed: {:?}", result.reports);
    assert!(
        result.code.contains("layout(binding = 0) uniform sampler2D tex;"),
        "code:\n{}",
        result.code
    );
    assert!(
        result.code.contains("texture(tex, uv)"),
        "code:\n{}",
        result.code
    );
}

#[test]
fn test_reserved_identifier_mangling() {
    let source = "float4 main(float3 pos : POSITION) : SV_Position {\n\
                  \tfloat varying = 1.0;\n\
                  \treturn float4(pos, varying);\n\
                  }";
    let result = compile(
        source,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl330,
        Options::default(),
    );
    assert!(result.success, "compile failed: {:?}", result.reports);
    assert!(
        result.code.contains("float xst_varying = 1.0;"),
        "code:\n{}",
        result.code
    );
    assert!(
        result.code.contains("vec4(pos, xst_varying)"),
        "code:\n{}",
        result.code
    );
}

#[test]
fn test_comments_preserved_when_enabled() {
    let source = "float4 main(float3 pos : POSITION) : SV_Position {\n\
                  \t// transform into clip space\n\
                  \treturn float4(pos, 1.0);\n\
                  }";
    let mut options = Options::default();
    options.comments = true;
    let result = compile(
        source,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl330,
        options.clone(),
    );
    assert!(result.success);
    assert!(
        result.code.contains("// transform into clip space"),
        "code:\n{}",
        result.code
    );

    options.comments = false;
    let without = compile(
        source,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl330,
        options,
    );
    assert!(!without.code.contains("transform into clip space"));
}

#[test]
fn test_unversioned_glsl_has_no_version_directive() {
    let result = compile(
        VERTEX_PASSTHROUGH,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl,
        Options::default(),
    );
    assert!(result.success, "compile failed: {:?}", result.reports);
    assert!(!result.code.contains("#version"));
}

#[test]
fn test_macro_manifest_in_statistics() {
    let source = "#define LIGHT_COUNT 4\n#define USE_FOG 1\n".to_string() + VERTEX_PASSTHROUGH;
    let result = compile(
        &source,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl330,
        Options::default(),
    );
    assert!(result.success, "compile failed: {:?}", result.reports);
    assert_eq!(
        result.statistics.macros,
        vec!["LIGHT_COUNT".to_string(), "USE_FOG".to_string()]
    );
}

#[test]
fn test_show_times_reports_stage_timings() {
    let mut options = Options::default();
    options.show_times = true;
    let result = compile(
        VERTEX_PASSTHROUGH,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl330,
        options,
    );
    assert!(result.success);
    let info_lines: Vec<&Report> = result
        .reports
        .iter()
        .filter(|r| r.severity == Severity::Info && r.message.starts_with("timing"))
        .collect();
    assert_eq!(info_lines.len(), 5);
}

#[test]
fn test_show_ast_dumps_to_log() {
    let mut options = Options::default();
    options.show_ast = true;
    let result = compile(
        VERTEX_PASSTHROUGH,
        "main",
        ShaderTarget::Vertex,
        OutputShaderVersion::Glsl330,
        options,
    );
    assert!(result.success);
    assert!(result
        .reports
        .iter()
        .any(|r| r.severity == Severity::Info && r.message.contains("function-decl 'main'")));
}

#[test]
fn test_fragment_target_output_declared() {
    let source = "float4 main(float2 uv : TEXCOORD0) : SV_Target { return float4(uv, 0, 1); }";
    let result = compile(
        source,
        "main",
        ShaderTarget::Fragment,
        OutputShaderVersion::Glsl330,
        Options::default(),
    );
    assert!(result.success, "compile failed: {:?}", result.reports);
    assert!(result.code.contains("out vec4"), "code:\n{}", result.code);
    assert_eq!(result.statistics.fragment_targets.len(), 1);
    assert_eq!(result.statistics.fragment_targets[0].location, 0);
}
