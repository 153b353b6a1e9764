//! HLSL to GLSL source-to-source shader compiler.
//!
//! The pipeline runs preprocessing, scanning, parsing, context analysis,
//! an optional optimization hook, target lowering and code emission, in
//! that order. Each stage consumes its predecessor's artifact; a stage
//! fails iff it recorded at least one error on the report handler.

pub mod analyzer;
pub mod ast;
pub mod diags;
pub mod error;
pub mod eval;
pub mod glsl;
pub mod intrinsics;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod preprocessor;
pub mod report;
pub mod source;
pub mod symbol_table;
pub mod token;
pub mod ty;
pub mod writer;

#[cfg(test)]
mod analyzer_tests;
#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod parser_tests;

use crate::analyzer::Analyzer;
use crate::diags::AstFormatter;
use crate::glsl::GlslConverter;
use crate::preprocessor::Preprocessor;
use crate::report::{Log, ReportHandler};
use log::debug;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write as _;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/* ----- Targets and versions ----- */

/// Pipeline stage the entry point runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderTarget {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
}

impl fmt::Display for ShaderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderTarget::Vertex => "Vertex Shader",
            ShaderTarget::TessellationControl => "Tessellation-Control Shader",
            ShaderTarget::TessellationEvaluation => "Tessellation-Evaluation Shader",
            ShaderTarget::Geometry => "Geometry Shader",
            ShaderTarget::Fragment => "Fragment Shader",
            ShaderTarget::Compute => "Compute Shader",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InputShaderVersion {
    Hlsl3,
    Hlsl4,
    Hlsl5,
}

impl fmt::Display for InputShaderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputShaderVersion::Hlsl3 => "HLSL 3.0",
            InputShaderVersion::Hlsl4 => "HLSL 4.0",
            InputShaderVersion::Hlsl5 => "HLSL 5.0",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutputShaderVersion {
    Glsl110,
    Glsl120,
    Glsl130,
    Glsl140,
    Glsl150,
    Glsl330,
    Glsl400,
    Glsl410,
    Glsl420,
    Glsl430,
    Glsl440,
    Glsl450,
    /// Version-less GLSL (no `#version` directive).
    Glsl,
}

impl OutputShaderVersion {
    /// Number for the `#version` directive; `None` for version-less GLSL.
    pub fn version_number(&self) -> Option<u32> {
        let number = match self {
            OutputShaderVersion::Glsl110 => 110,
            OutputShaderVersion::Glsl120 => 120,
            OutputShaderVersion::Glsl130 => 130,
            OutputShaderVersion::Glsl140 => 140,
            OutputShaderVersion::Glsl150 => 150,
            OutputShaderVersion::Glsl330 => 330,
            OutputShaderVersion::Glsl400 => 400,
            OutputShaderVersion::Glsl410 => 410,
            OutputShaderVersion::Glsl420 => 420,
            OutputShaderVersion::Glsl430 => 430,
            OutputShaderVersion::Glsl440 => 440,
            OutputShaderVersion::Glsl450 => 450,
            OutputShaderVersion::Glsl => return None,
        };
        Some(number)
    }

    pub fn supports_uniform_blocks(&self) -> bool {
        *self >= OutputShaderVersion::Glsl140
    }

    pub fn supports_explicit_bindings(&self) -> bool {
        *self >= OutputShaderVersion::Glsl420 && *self != OutputShaderVersion::Glsl
    }
}

impl fmt::Display for OutputShaderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version_number() {
            Some(number) => write!(f, "GLSL {}.{:02}", number / 100, number % 100),
            None => write!(f, "GLSL"),
        }
    }
}

/* ----- Options ----- */

/// Output and formatting options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Stop after preprocessing and copy the expanded source to the output.
    pub preprocess_only: bool,
    /// Run the full pipeline but discard the generated code.
    pub validate_only: bool,
    /// Run the optimization hook.
    pub optimize: bool,
    /// Dump the decorated AST to the log.
    pub show_ast: bool,
    /// Report per-stage timings to the log.
    pub show_times: bool,
    /// Populate the statistics sink.
    pub show_stat: bool,
    /// Prefer helper functions over inlining intrinsic wrappers.
    pub prefer_wrappers: bool,
    /// Keep statement-attached comments in the output.
    pub comments: bool,
    pub enable_indent: bool,
    pub enable_new_line: bool,
    /// Indentation unit.
    pub indent: String,
    /// Prefix for identifiers that collide with reserved target words.
    pub name_mangling_prefix: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            preprocess_only: false,
            validate_only: false,
            optimize: false,
            show_ast: false,
            show_times: false,
            show_stat: false,
            prefer_wrappers: true,
            comments: false,
            enable_indent: true,
            enable_new_line: true,
            indent: "    ".to_string(),
            name_mangling_prefix: "xst_".to_string(),
        }
    }
}

/* ----- Include handling ----- */

#[derive(Debug, Error)]
pub enum IncludeError {
    #[error("failed to include file: \"{0}\"")]
    NotFound(String),
    #[error("IO error while including \"{0}\": {1}")]
    Io(String, std::io::Error),
}

/// Resolves `#include` directives to source text. Called synchronously by
/// the preprocessor; handles must not outlive the call.
pub trait IncludeHandler {
    fn include(&mut self, filename: &str, use_search_paths: bool)
        -> Result<String, IncludeError>;
}

/// Default include handler reading from the file system, optionally
/// through a list of search paths.
#[derive(Debug, Default)]
pub struct FileIncludeHandler {
    pub search_paths: Vec<PathBuf>,
}

impl IncludeHandler for FileIncludeHandler {
    fn include(
        &mut self,
        filename: &str,
        use_search_paths: bool,
    ) -> Result<String, IncludeError> {
        let direct = PathBuf::from(filename);
        let mut candidates = Vec::new();
        if use_search_paths {
            for path in &self.search_paths {
                candidates.push(path.join(filename));
            }
            candidates.push(direct);
        } else {
            candidates.push(direct);
            for path in &self.search_paths {
                candidates.push(path.join(filename));
            }
        }

        for candidate in candidates {
            match std::fs::read_to_string(&candidate) {
                Ok(source) => return Ok(source),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(IncludeError::Io(filename.to_string(), err)),
            }
        }
        Err(IncludeError::NotFound(filename.to_string()))
    }
}

/* ----- Statistics ----- */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub location: i32,
    pub ident: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerFilter {
    MinMagMipPoint,
    MinMagPointMipLinear,
    MinPointMagLinearMipPoint,
    MinPointMagMipLinear,
    MinLinearMagMipPoint,
    MinLinearMagPointMipLinear,
    MinMagLinearMipPoint,
    MinMagMipLinear,
    Anisotropic,
    ComparisonMinMagMipPoint,
    ComparisonMinMagPointMipLinear,
    ComparisonMinPointMagLinearMipPoint,
    ComparisonMinPointMagMipLinear,
    ComparisonMinLinearMagMipPoint,
    ComparisonMinLinearMagPointMipLinear,
    ComparisonMinMagLinearMipPoint,
    ComparisonMinMagMipLinear,
    ComparisonAnisotropic,
    MinimumMinMagMipPoint,
    MinimumMinMagPointMipLinear,
    MinimumMinPointMagLinearMipPoint,
    MinimumMinPointMagMipLinear,
    MinimumMinLinearMagMipPoint,
    MinimumMinLinearMagPointMipLinear,
    MinimumMinMagLinearMipPoint,
    MinimumMinMagMipLinear,
    MinimumAnisotropic,
    MaximumMinMagMipPoint,
    MaximumMinMagPointMipLinear,
    MaximumMinPointMagLinearMipPoint,
    MaximumMinPointMagMipLinear,
    MaximumMinLinearMagMipPoint,
    MaximumMinLinearMagPointMipLinear,
    MaximumMinMagLinearMipPoint,
    MaximumMinMagMipLinear,
    MaximumAnisotropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureAddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
    MirrorOnce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Static sampler state parsed from a declaration body.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerState {
    pub filter: SamplerFilter,
    pub address_u: TextureAddressMode,
    pub address_v: TextureAddressMode,
    pub address_w: TextureAddressMode,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub comparison_func: ComparisonFunc,
    pub border_color: [f32; 4],
    pub min_lod: f32,
    pub max_lod: f32,
}

impl Default for SamplerState {
    fn default() -> Self {
        SamplerState {
            filter: SamplerFilter::MinMagMipLinear,
            address_u: TextureAddressMode::Clamp,
            address_v: TextureAddressMode::Clamp,
            address_w: TextureAddressMode::Clamp,
            mip_lod_bias: 0.0,
            max_anisotropy: 1,
            comparison_func: ComparisonFunc::Never,
            border_color: [0.0; 4],
            min_lod: -f32::MAX,
            max_lod: f32::MAX,
        }
    }
}

/// Side-channel statistics collected during analysis. Bindings are sorted
/// by location before the compile call returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    pub macros: Vec<String>,
    pub textures: Vec<Binding>,
    pub constant_buffers: Vec<Binding>,
    pub fragment_targets: Vec<Binding>,
    pub sampler_states: BTreeMap<String, SamplerState>,
}

/* ----- Compile descriptors ----- */

/// Input description for a compilation.
pub struct ShaderInput<'a> {
    pub source: &'a str,
    /// Logical file name used in diagnostics.
    pub filename: String,
    pub entry_point: String,
    pub shader_target: ShaderTarget,
    pub shader_version: InputShaderVersion,
    pub include_handler: Option<&'a mut dyn IncludeHandler>,
}

/// Output description for a compilation.
pub struct ShaderOutput<'a> {
    pub code: &'a mut dyn std::io::Write,
    pub shader_version: OutputShaderVersion,
    pub options: Options,
    pub statistics: Option<&'a mut Statistics>,
}

pub use report::{Report, Severity, StdLog};

/* ----- Compilation ----- */

/// Compiles HLSL source to GLSL. Returns true on success; diagnostics are
/// delivered to the log sink either way.
pub fn compile_shader(
    mut input: ShaderInput<'_>,
    output: &mut ShaderOutput<'_>,
    log: Option<&mut dyn Log>,
) -> bool {
    let mut reports = ReportHandler::new(log);
    let options = output.options.clone();

    /* Validate configuration */
    if matches!(
        output.shader_version,
        OutputShaderVersion::Glsl110 | OutputShaderVersion::Glsl120
    ) {
        reports.error(
            &format!(
                "output shader version '{}' is not supported",
                output.shader_version
            ),
            None,
        );
        return false;
    }
    if input.entry_point.is_empty() {
        reports.error("entry point must not be empty", None);
        return false;
    }

    let mut timings: Vec<(&'static str, Instant)> = Vec::new();
    timings.push(("start", Instant::now()));

    /* Preprocess input code */
    let mut std_include_handler = FileIncludeHandler::default();
    let include_handler: &mut dyn IncludeHandler = match input.include_handler.take() {
        Some(handler) => handler,
        None => &mut std_include_handler,
    };

    let preprocessor = Preprocessor::new(include_handler, &mut reports);
    let (processed, macro_idents) = preprocessor.process(input.source, &input.filename);

    if let Some(statistics) = output.statistics.as_deref_mut() {
        statistics.macros = macro_idents;
    }

    if reports.has_errors() {
        reports.error("preprocessing input code failed", None);
        return false;
    }
    timings.push(("pre-processing", Instant::now()));

    if options.preprocess_only {
        let _ = output.code.write_all(processed.as_bytes());
        return true;
    }

    /* Parse input code */
    let mut program = match parser::parse_source(&processed, &input.filename, &mut reports) {
        Some(program) => program,
        None => {
            reports.error("parsing input code failed", None);
            return false;
        }
    };
    timings.push(("parsing", Instant::now()));

    /* Context analysis */
    let analyzer = Analyzer::new(
        &input.entry_point,
        input.shader_target,
        input.shader_version,
        options.prefer_wrappers,
        output.statistics.as_deref_mut(),
        &mut reports,
    );
    let analyzed = analyzer.decorate(&mut program);

    if options.show_ast {
        for line in AstFormatter::format_program(&program).lines() {
            reports.info(line);
        }
    }

    if !analyzed {
        reports.error("analyzing input code failed", None);
        return false;
    }
    timings.push(("context analysis", Instant::now()));

    /* Optimization */
    if options.optimize {
        optimizer::optimize(&mut program);
    }
    timings.push(("optimization", Instant::now()));

    /* Target lowering and code emission */
    GlslConverter::new(&options.name_mangling_prefix).convert(&mut program);

    let code = match glsl::generate(
        &program,
        input.shader_target,
        output.shader_version,
        &options,
        &mut reports,
    ) {
        Ok(code) => code,
        Err(err) => {
            let area = err.area();
            reports.error(&err.to_string(), area);
            reports.error("generating output code failed", None);
            return false;
        }
    };
    timings.push(("code generation", Instant::now()));

    if reports.has_errors() {
        reports.error("generating output code failed", None);
        return false;
    }

    if !options.validate_only {
        if output.code.write_all(code.as_bytes()).is_err() {
            reports.error("writing output stream failed", None);
            return false;
        }
    }

    /* Sort statistics for deterministic consumption */
    if let Some(statistics) = output.statistics.as_deref_mut() {
        statistics.textures.sort_by_key(|b| b.location);
        statistics.constant_buffers.sort_by_key(|b| b.location);
        statistics.fragment_targets.sort_by_key(|b| b.location);
    }

    /* Report timings */
    if options.show_times {
        for window in timings.windows(2) {
            let (_, begin) = window[0];
            let (name, end) = window[1];
            let duration = end.duration_since(begin).as_millis();
            reports.info(&format!("timing {}: {} ms", name, duration));
        }
    }

    debug!("compilation finished");
    true
}
