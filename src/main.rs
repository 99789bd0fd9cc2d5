use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use jitdump::config::{self, RuntimeConfig};
use jitdump::jit::{DisassemblyLayout, JitCompiler, data_log};
use jitdump::vm::{CodeBlock, Program, dump::format_bytecode};
use jitdump::logging;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Bytecode-annotated disassembly
    #[default]
    Text,
    /// Region layout as JSON
    Json,
}

#[derive(Parser)]
#[command(name = "jitdump")]
#[command(about = "Baseline JIT with bytecode-annotated disassembly", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a program and dump the disassembly of its code blocks
    Dump {
        /// Program file (TOML)
        file: PathBuf,

        /// Only dump this function
        #[arg(short, long)]
        function: Option<String>,

        /// Output format (text, json)
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Report code at this address (hex or decimal) for reproducible output
        #[arg(long, value_name = "ADDR")]
        base_address: Option<String>,

        /// Write the dump to a file instead of standard output
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Runtime config file (jitdump.toml)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Trace JIT compilation events
        #[arg(long)]
        trace_jit: bool,
    },
    /// Print the bytecode listing of a program
    Bytecode {
        /// Program file (TOML)
        file: PathBuf,
    },
    /// Verify and compile every code block of a program
    Check {
        /// Program file (TOML)
        file: PathBuf,

        /// Runtime config file (jitdump.toml)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Trace JIT compilation events
        #[arg(long)]
        trace_jit: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let trace_jit = match &cli.command {
        Commands::Dump { trace_jit, .. } | Commands::Check { trace_jit, .. } => *trace_jit,
        Commands::Bytecode { .. } => false,
    };
    if let Err(e) = logging::init(trace_jit) {
        eprintln!("warning: failed to initialize logging: {}", e);
    }

    let result = match cli.command {
        Commands::Dump {
            file,
            function,
            format,
            base_address,
            output,
            config,
            trace_jit: _,
        } => load_config(config.as_deref(), base_address.as_deref()).and_then(|config| {
            dump_file(&file, function.as_deref(), format, output.as_deref(), &config)
        }),
        Commands::Bytecode { file } => Program::load(&file)
            .map(|program| print!("{}", format_bytecode(&program)))
            .map_err(|e| e.to_string()),
        Commands::Check {
            file,
            config,
            trace_jit: _,
        } => load_config(config.as_deref(), None).and_then(|config| {
            open_data_file(&config)?;
            check_file(&file, &config)
        }),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Config file (if any) overridden by command-line flags.
fn load_config(path: Option<&Path>, base_address: Option<&str>) -> Result<RuntimeConfig, String> {
    let mut config = match path {
        Some(path) => RuntimeConfig::load(path).map_err(|e| e.to_string())?,
        None => RuntimeConfig::default(),
    };

    if let Some(text) = base_address {
        config.base_address = Some(config::parse_address(text).map_err(|e| e.to_string())?);
    }

    Ok(config)
}

/// Point the data log at the configured file. Opening truncates it, so this
/// only happens when a dump will actually be written there.
fn open_data_file(config: &RuntimeConfig) -> Result<(), String> {
    match &config.data_file {
        Some(data_file) if config.show_disassembly => data_log::set_data_file(data_file)
            .map_err(|e| format!("failed to open {}: {}", data_file.display(), e)),
        _ => Ok(()),
    }
}

fn select<'p>(program: &'p Program, function: Option<&str>) -> Result<Vec<&'p CodeBlock>, String> {
    match function {
        Some(name) => program
            .get(name)
            .map(|block| vec![block])
            .map_err(|e| e.to_string()),
        None => Ok(program.functions.iter().collect()),
    }
}

#[derive(Serialize)]
struct FunctionLayout<'a> {
    function: &'a str,
    instruction_count: usize,
    #[serde(flatten)]
    layout: DisassemblyLayout,
}

fn dump_file(
    path: &Path,
    function: Option<&str>,
    format: OutputFormat,
    output: Option<&Path>,
    config: &RuntimeConfig,
) -> Result<(), String> {
    let program = Program::load(path).map_err(|e| e.to_string())?;
    let blocks = select(&program, function)?;

    // The dump below is the output; don't also send it to the data file.
    let compiler = JitCompiler::new(&RuntimeConfig {
        show_disassembly: false,
        ..config.clone()
    });

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).map_err(|e| format!("failed to create {}: {}", path.display(), e))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let write_error = |e: io::Error| format!("failed to write dump: {}", e);
    let mut layouts = Vec::new();

    for (i, block) in blocks.iter().enumerate() {
        let compiled = compiler
            .compile(block)
            .map_err(|e| format!("function '{}': {}", block.name, e))?;

        match format {
            OutputFormat::Text => {
                if i > 0 {
                    writeln!(out).map_err(write_error)?;
                }
                compiled
                    .dump_disassembly(&mut out, block)
                    .map_err(write_error)?;
            }
            OutputFormat::Json => layouts.push(FunctionLayout {
                function: &block.name,
                instruction_count: block.instruction_count(),
                layout: compiled.layout(),
            }),
        }
    }

    if let OutputFormat::Json = format {
        serde_json::to_writer_pretty(&mut out, &layouts)
            .map_err(|e| format!("failed to write JSON: {}", e))?;
        writeln!(out).map_err(write_error)?;
    }

    out.flush().map_err(write_error)
}

fn check_file(path: &Path, config: &RuntimeConfig) -> Result<(), String> {
    let program = Program::load(path).map_err(|e| e.to_string())?;
    let compiler = JitCompiler::new(config);

    for block in &program.functions {
        let compiled = compiler
            .compile(block)
            .map_err(|e| format!("function '{}': {}", block.name, e))?;
        println!(
            "ok: {} ({} instructions, {} bytes)",
            block.name,
            block.instruction_count(),
            compiled.link.debug_size()
        );
    }

    Ok(())
}
