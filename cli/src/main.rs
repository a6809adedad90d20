mod test_runner;

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use glyph::{CompilationResult, CompileOptions, Compiler, CompilerConfig};

#[derive(Parser)]
#[command(name = "glyph", version, about = "Glyph Markdown compiler")]
struct Cli {
    /// Disable colored diagnostic output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log compiler phases to stderr (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a document and print its IR as JSON
    Compile(CompileArgs),

    /// Compile a document and report diagnostics only
    Check(CheckArgs),

    /// Run .test.md fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct CompileArgs {
    /// Markdown source file to compile
    file: String,

    /// Force the document id
    #[arg(long)]
    id: Option<String>,

    /// Compiler config (TOML)
    #[arg(long)]
    config: Option<String>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Markdown source file to check
    file: String,

    /// Compiler config (TOML)
    #[arg(long)]
    config: Option<String>,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Compile(args) => {
            let compiler = load_compiler(args.config.as_deref());
            let result = compile_file(&compiler, &args.file, args.id, cli.no_color);
            let json = if args.pretty {
                serde_json::to_string_pretty(&result.ir)
            } else {
                serde_json::to_string(&result.ir)
            };
            match json {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("error: cannot serialize IR: {}", e);
                    process::exit(1);
                }
            }
            if result.has_errors {
                process::exit(1);
            }
        }
        Command::Check(args) => {
            let compiler = load_compiler(args.config.as_deref());
            let result = compile_file(&compiler, &args.file, None, cli.no_color);
            let errors = result.errors().count();
            if errors > 0 {
                eprintln!("error: {} failed with {} error(s)", args.file, errors);
                process::exit(1);
            }
            eprintln!(
                "ok: {} compiled ({} blocks, {} references)",
                args.file,
                result.ir.all_block_ids().len(),
                result.ir.references.len()
            );
        }
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("glyph=debug"),
        _ => EnvFilter::new("glyph=trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn load_compiler(config_path: Option<&str>) -> Compiler {
    let Some(path) = config_path else {
        return Compiler::new();
    };
    match CompilerConfig::load(path) {
        Ok(config) => {
            let compiler = Compiler::with_config(config);
            let config = compiler.config();
            debug!(
                path,
                max_container_depth = config.max_container_depth,
                containers = config.containers.len(),
                "loaded compiler config"
            );
            compiler
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

/// Compile `file` and print its diagnostics to stderr.
fn compile_file(
    compiler: &Compiler,
    file: &str,
    document_id: Option<String>,
    no_color: bool,
) -> CompilationResult {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", file, e);
            process::exit(1);
        }
    };

    let options = CompileOptions {
        file_path: Some(file.to_string()),
        document_id,
    };
    let result = compiler.compile(&source, &options);

    let mut files = SimpleFiles::new();
    let file_id = files.add(file.to_string(), source);
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    for diagnostic in &result.diagnostics {
        let _ = term::emit_to_write_style(
            &mut writer.lock(),
            &config,
            &files,
            &diagnostic.to_codespan(file_id),
        );
    }

    result
}
