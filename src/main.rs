use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use docbot::backend::Client;
use docbot::config::{anchored, Options, Personality};
use docbot::pipeline;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "docbot")]
#[command(version)]
#[command(about = "Extracts matching C/C++ functions and asks a model to document or test them")]
struct Cli {
    /// C or C++ source file to scan
    #[arg(long = "input-file", short = 'f', value_name = "FILE")]
    input_file: Option<PathBuf>,

    /// Include directory for the compiler invocation (repeatable)
    #[arg(long = "search-path", short = 'I', value_name = "DIR")]
    search_paths: Vec<PathBuf>,

    /// Function name pattern (full match; default matches every function)
    #[arg(long, short = 'r', value_name = "PATTERN", default_value = ".*")]
    regex: String,

    /// API key (falls back to the OPENAI_API_KEY environment variable)
    #[arg(long = "api-key", short = 'k', value_name = "KEY")]
    api_key: Option<String>,

    /// Backend personality
    #[arg(long, short = 'p', value_enum, default_value_t = Personality::Testbot)]
    personality: Personality,

    /// Enable debug logging
    #[arg(long, short = 'd')]
    debug: bool,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the models available to this credential (JSON to stdout)
    Models,
}

/// Usage errors get the full flag listing on stderr before the exit-1
/// message, so a bare invocation explains itself.
fn print_usage_to_stderr() {
    eprintln!("{}", Cli::command().render_help());
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    // Credential resolution happens before anything that could touch the
    // network: flag first, then environment, then a hard usage error.
    let api_key = cli
        .api_key
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|key| !key.is_empty());
    let Some(api_key) = api_key else {
        print_usage_to_stderr();
        bail!("need an API key: pass --api-key or set OPENAI_API_KEY");
    };

    if matches!(cli.cmd, Some(Command::Models)) {
        let models = Client::new(api_key).list_models()?;
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    let Some(input_file) = cli.input_file else {
        print_usage_to_stderr();
        bail!("need an input file: pass --input-file <FILE>");
    };

    let function_name = anchored(&cli.regex)
        .with_context(|| format!("invalid function name pattern: {}", cli.regex))?;

    let opts = Options {
        input_file,
        function_name,
        api_key,
        search_paths: cli.search_paths,
        personality: cli.personality,
    };
    pipeline::run(&opts)
}
