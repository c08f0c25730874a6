use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use miette::{Context, IntoDiagnostic};

use glslt_compiler::{
    ArrayIndexClampingStrategy, CompileOptions, CompileOutput, Compiler, Resources, ShaderSpec,
    ShaderStage, ShaderVariable,
};

/// glslt: GLSL ES shader validator and translator
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Input shader files, concatenated in order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Shader stage (default: from the first file's extension)
    #[arg(short, long, value_enum)]
    stage: Option<Stage>,

    /// API profile (default: gles2, or gles3 for `#version 300 es` shaders)
    #[arg(long, value_enum)]
    spec: Option<Spec>,

    /// Target backend
    #[arg(short, long, default_value = glslt_compiler::DEFAULT_TARGET)]
    target: String,

    /// Output path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Extra compile option, repeatable (e.g. `-O unfold-short-circuit`)
    #[arg(short = 'O', long = "option", value_parser = parse_option)]
    options: Vec<CompileOptions>,

    /// Dump the rewritten tree to stderr
    #[arg(long)]
    emit_ast: bool,

    /// Print reflection data to stderr
    #[arg(long)]
    variables: bool,

    /// Validate and rewrite without running the backend
    #[arg(long)]
    dry_run: bool,

    /// Hash user identifiers into `webgl_<hash>` names
    #[arg(long)]
    hash_names: bool,

    /// How clamped indices are written
    #[arg(long, value_enum, default_value = "intrinsic")]
    clamp: Clamp,

    #[arg(long, default_value_t = 256)]
    max_expression_complexity: u32,

    #[arg(long, default_value_t = 256)]
    max_call_stack_depth: u32,

    #[arg(long, default_value_t = 128)]
    max_vertex_uniform_vectors: u32,

    #[arg(long, default_value_t = 16)]
    max_fragment_uniform_vectors: u32,

    #[arg(long, default_value_t = 8)]
    max_varying_vectors: u32,

    #[arg(long, default_value_t = 1)]
    max_draw_buffers: u32,

    /// Enable OES_standard_derivatives
    #[arg(long)]
    standard_derivatives: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Stage {
    Vertex,
    Fragment,
}

#[derive(Clone, Copy, ValueEnum)]
enum Spec {
    Gles2,
    Webgl,
    Css,
    Gles3,
    Webgl2,
}

#[derive(Clone, Copy, ValueEnum)]
enum Clamp {
    Intrinsic,
    Function,
}

fn parse_option(s: &str) -> Result<CompileOptions, String> {
    CompileOptions::from_name(s).ok_or_else(|| {
        let known: Vec<&str> = CompileOptions::names().collect();
        format!("unknown option '{s}', expected one of: {}", known.join(", "))
    })
}

fn stage_from_extension(path: &Path) -> Option<ShaderStage> {
    match path.extension()?.to_str()? {
        "vert" | "vs" => Some(ShaderStage::Vertex),
        "frag" | "fs" => Some(ShaderStage::Fragment),
        _ => None,
    }
}

/// 64-bit FNV-1a, used for `--hash-names`.
fn fnv1a(name: &str) -> u64 {
    name.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    // 1. Read sources.
    let mut sources = Vec::with_capacity(cli.inputs.len());
    for path in &cli.inputs {
        let source = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        sources.push(source);
    }
    let sources: Vec<&str> = sources.iter().map(String::as_str).collect();

    // 2. Resolve stage and profile.
    let stage = match cli.stage {
        Some(Stage::Vertex) => ShaderStage::Vertex,
        Some(Stage::Fragment) => ShaderStage::Fragment,
        None => stage_from_extension(&cli.inputs[0]).ok_or_else(|| {
            miette::miette!(
                "cannot infer the stage of {}; pass --stage",
                cli.inputs[0].display()
            )
        })?,
    };
    let spec = match cli.spec {
        Some(Spec::Gles2) => ShaderSpec::Gles2,
        Some(Spec::Webgl) => ShaderSpec::WebGl,
        Some(Spec::Css) => ShaderSpec::Css,
        Some(Spec::Gles3) => ShaderSpec::Gles3,
        Some(Spec::Webgl2) => ShaderSpec::WebGl2,
        None => match glslt_compiler::detect_version(&sources, stage) {
            Some(300) => ShaderSpec::Gles3,
            _ => ShaderSpec::Gles2,
        },
    };

    let resources = Resources {
        max_expression_complexity: cli.max_expression_complexity,
        max_call_stack_depth: cli.max_call_stack_depth,
        max_vertex_uniform_vectors: cli.max_vertex_uniform_vectors,
        max_fragment_uniform_vectors: cli.max_fragment_uniform_vectors,
        max_varying_vectors: cli.max_varying_vectors,
        max_draw_buffers: cli.max_draw_buffers,
        oes_standard_derivatives: cli.standard_derivatives,
        array_index_clamping_strategy: match cli.clamp {
            Clamp::Intrinsic => ArrayIndexClampingStrategy::ClampIntrinsic,
            Clamp::Function => ArrayIndexClampingStrategy::UserDefinedIntFunction,
        },
        hash_function: cli.hash_names.then_some(fnv1a as fn(&str) -> u64),
        ..Resources::default()
    };

    // 3. Collect options.
    let mut options = cli
        .options
        .iter()
        .fold(CompileOptions::NONE, |acc, option| acc | *option);
    if !cli.dry_run {
        options |= CompileOptions::OBJECT_CODE;
    }
    if cli.emit_ast {
        options |= CompileOptions::INTERMEDIATE_TREE;
    }
    if cli.variables {
        options |= CompileOptions::VARIABLES;
    }

    // 4. Compile.
    let mut compiler = Compiler::new(stage, spec, resources)
        .with_backend(&cli.target)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("backend selection failed")?;
    let output = compiler.compile(&sources, options);

    // 5. Print diagnostics.
    eprint!("{}", output.info_log);
    if !output.success {
        return Err(miette::miette!(
            "{} error(s) in {stage} shader",
            output.diagnostics.error_count()
        ));
    }

    if let Some(ast) = &output.ast_dump {
        eprintln!("{ast}");
    }
    if cli.variables {
        print_variables(&output);
    }

    // 6. Write output.
    let Some(code) = &output.object_code else {
        return Ok(());
    };
    match &cli.output {
        Some(path) => std::fs::write(path, code)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display()))?,
        None => print!("{code}"),
    }
    Ok(())
}

fn print_variables(output: &CompileOutput) {
    let groups: [(&str, &[ShaderVariable]); 4] = [
        ("attribute", &output.variables.attributes),
        ("output", &output.variables.outputs),
        ("uniform", &output.variables.uniforms),
        ("varying", &output.variables.varyings),
    ];
    for (kind, variables) in groups {
        for variable in variables {
            let array = variable
                .array_size
                .map(|size| format!("[{size}]"))
                .unwrap_or_default();
            eprintln!(
                "{kind} {} {}{array} -> {}",
                variable.type_name(),
                variable.name,
                variable.mapped_name
            );
        }
    }
    for block in &output.variables.interface_blocks {
        eprintln!("block {} ({} field(s))", block.name, block.fields.len());
    }
}
