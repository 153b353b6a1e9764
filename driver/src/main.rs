use clap::{Parser, Subcommand, ValueEnum};
use hlslcc_core::{
    compile_shader, FileIncludeHandler, InputShaderVersion, Options, OutputShaderVersion,
    ShaderInput, ShaderOutput, ShaderTarget, Statistics, StdLog,
};
use log::info;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "hlslcc")]
#[command(about = "HLSL to GLSL source-to-source shader compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a shader file to GLSL
    Compile {
        /// Input HLSL source file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (defaults to the input name with a stage extension)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Entry point function
        #[arg(short, long, default_value = "main")]
        entry: String,

        /// Target shader stage
        #[arg(short, long, value_enum, default_value_t = TargetArg::Vertex)]
        target: TargetArg,

        /// Input shader version
        #[arg(long, value_enum, default_value_t = InputVersionArg::Hlsl5)]
        input_version: InputVersionArg,

        /// Output shader version
        #[arg(long, value_enum, default_value_t = OutputVersionArg::Glsl330)]
        output_version: OutputVersionArg,

        /// Additional include search paths
        #[arg(short = 'I', long = "include-path", value_name = "DIR")]
        include_paths: Vec<PathBuf>,

        /// Stop after preprocessing
        #[arg(long)]
        preprocess_only: bool,

        /// Dump the AST to the log
        #[arg(long)]
        show_ast: bool,

        /// Report per-stage timings
        #[arg(long)]
        show_times: bool,

        /// Print resource binding statistics
        #[arg(long)]
        stats: bool,

        /// Inline intrinsic wrappers instead of emitting helper functions
        #[arg(long)]
        inline_wrappers: bool,

        /// Keep statement comments in the output
        #[arg(long)]
        comments: bool,
    },

    /// Validate a shader file without writing output
    Check {
        /// Input HLSL source file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Entry point function
        #[arg(short, long, default_value = "main")]
        entry: String,

        /// Target shader stage
        #[arg(short, long, value_enum, default_value_t = TargetArg::Vertex)]
        target: TargetArg,

        /// Input shader version
        #[arg(long, value_enum, default_value_t = InputVersionArg::Hlsl5)]
        input_version: InputVersionArg,

        /// Additional include search paths
        #[arg(short = 'I', long = "include-path", value_name = "DIR")]
        include_paths: Vec<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetArg {
    Vertex,
    TessControl,
    TessEvaluation,
    Geometry,
    Fragment,
    Compute,
}

impl From<TargetArg> for ShaderTarget {
    fn from(value: TargetArg) -> Self {
        match value {
            TargetArg::Vertex => ShaderTarget::Vertex,
            TargetArg::TessControl => ShaderTarget::TessellationControl,
            TargetArg::TessEvaluation => ShaderTarget::TessellationEvaluation,
            TargetArg::Geometry => ShaderTarget::Geometry,
            TargetArg::Fragment => ShaderTarget::Fragment,
            TargetArg::Compute => ShaderTarget::Compute,
        }
    }
}

impl TargetArg {
    fn default_extension(&self) -> &'static str {
        match self {
            TargetArg::Vertex => "vert",
            TargetArg::TessControl => "tesc",
            TargetArg::TessEvaluation => "tese",
            TargetArg::Geometry => "geom",
            TargetArg::Fragment => "frag",
            TargetArg::Compute => "comp",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum InputVersionArg {
    Hlsl3,
    Hlsl4,
    Hlsl5,
}

impl From<InputVersionArg> for InputShaderVersion {
    fn from(value: InputVersionArg) -> Self {
        match value {
            InputVersionArg::Hlsl3 => InputShaderVersion::Hlsl3,
            InputVersionArg::Hlsl4 => InputShaderVersion::Hlsl4,
            InputVersionArg::Hlsl5 => InputShaderVersion::Hlsl5,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputVersionArg {
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
    Glsl,
}

impl From<OutputVersionArg> for OutputShaderVersion {
    fn from(value: OutputVersionArg) -> Self {
        match value {
            OutputVersionArg::Glsl130 => OutputShaderVersion::Glsl130,
            OutputVersionArg::Glsl140 => OutputShaderVersion::Glsl140,
            OutputVersionArg::Glsl150 => OutputShaderVersion::Glsl150,
            OutputVersionArg::Glsl330 => OutputShaderVersion::Glsl330,
            OutputVersionArg::Glsl400 => OutputShaderVersion::Glsl400,
            OutputVersionArg::Glsl410 => OutputShaderVersion::Glsl410,
            OutputVersionArg::Glsl420 => OutputShaderVersion::Glsl420,
            OutputVersionArg::Glsl430 => OutputShaderVersion::Glsl430,
            OutputVersionArg::Glsl440 => OutputShaderVersion::Glsl440,
            OutputVersionArg::Glsl450 => OutputShaderVersion::Glsl450,
            OutputVersionArg::Glsl => OutputShaderVersion::Glsl,
        }
    }
}

#[derive(Debug, Error)]
enum DriverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("compilation failed with errors")]
    CompilationFailed,
}

fn main() -> Result<(), DriverError> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            output,
            entry,
            target,
            input_version,
            output_version,
            include_paths,
            preprocess_only,
            show_ast,
            show_times,
            stats,
            inline_wrappers,
            comments,
        } => {
            let options = Options {
                preprocess_only,
                show_ast,
                show_times,
                show_stat: stats,
                prefer_wrappers: !inline_wrappers,
                comments,
                ..Options::default()
            };
            let output_path = output.unwrap_or_else(|| {
                let mut path = input.clone();
                path.set_extension(target.default_extension());
                path
            });
            compile_file(
                &input,
                Some(&output_path),
                &entry,
                target,
                input_version,
                output_version,
                include_paths,
                options,
                stats,
            )
        }
        Commands::Check {
            input,
            entry,
            target,
            input_version,
            include_paths,
        } => {
            let options = Options {
                validate_only: true,
                ..Options::default()
            };
            compile_file(
                &input,
                None,
                &entry,
                target,
                input_version,
                OutputVersionArg::Glsl450,
                include_paths,
                options,
                false,
            )
        }
    }
}

fn compile_file(
    input: &PathBuf,
    output: Option<&PathBuf>,
    entry: &str,
    target: TargetArg,
    input_version: InputVersionArg,
    output_version: OutputVersionArg,
    include_paths: Vec<PathBuf>,
    options: Options,
    print_stats: bool,
) -> Result<(), DriverError> {
    info!("compiling {}", input.display());

    let source = fs::read_to_string(input)?;
    let filename = input.display().to_string();

    let mut include_handler = FileIncludeHandler {
        search_paths: include_paths,
    };
    let mut statistics = Statistics::default();
    let mut log = StdLog;
    let mut buffer = Vec::new();

    let success = {
        let shader_input = ShaderInput {
            source: &source,
            filename,
            entry_point: entry.to_string(),
            shader_target: target.into(),
            shader_version: input_version.into(),
            include_handler: Some(&mut include_handler),
        };
        let mut shader_output = ShaderOutput {
            code: &mut buffer,
            shader_version: output_version.into(),
            options,
            statistics: Some(&mut statistics),
        };
        compile_shader(shader_input, &mut shader_output, Some(&mut log))
    };

    if !success {
        return Err(DriverError::CompilationFailed);
    }

    match output {
        Some(path) => {
            fs::write(path, &buffer)?;
            info!("wrote {}", path.display());
        }
        None => {
            println!("{} is valid", input.display());
        }
    }

    if print_stats {
        print_statistics(&statistics);
    }

    Ok(())
}

fn print_statistics(statistics: &Statistics) {
    let print_bindings = |title: &str, bindings: &[hlslcc_core::Binding]| {
        if bindings.is_empty() {
            return;
        }
        println!("{}:", title);
        for binding in bindings {
            println!("  {} -> location {}", binding.ident, binding.location);
        }
    };

    if !statistics.macros.is_empty() {
        println!("macros:");
        for ident in &statistics.macros {
            println!("  {}", ident);
        }
    }
    print_bindings("textures", &statistics.textures);
    print_bindings("constant buffers", &statistics.constant_buffers);
    print_bindings("fragment targets", &statistics.fragment_targets);

    if !statistics.sampler_states.is_empty() {
        println!("sampler states:");
        for (ident, state) in &statistics.sampler_states {
            println!(
                "  {}: filter {:?}, address ({:?}, {:?}, {:?})",
                ident, state.filter, state.address_u, state.address_v, state.address_w
            );
        }
    }
}
