use clap::{Parser as ClapParser, Subcommand};
use pipeline_rules::cli::{self, CheckOptions, CheckResult, CliError};
use pipeline_rules::{FunctionRegistry, InterpreterConfig};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "rules")]
#[command(about = "Parse and run log processing rules against JSON messages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and run rules, or a single expression, against a message
    Check {
        /// Rule source (`rule "name" when ... then ... end`) or an expression
        source: String,

        /// JSON message (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Interpreter config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only validate syntax, don't execute
        #[arg(long)]
        syntax_only: bool,
    },

    /// List the builtin functions
    Functions,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            source,
            input,
            config,
            pretty,
            syntax_only,
        } => run_check(source, input, config, pretty, syntax_only),
        Commands::Functions => {
            print!("{}", cli::list_functions(&FunctionRegistry::with_builtins()));
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_check(
    source: String,
    input: Option<String>,
    config: Option<PathBuf>,
    pretty: bool,
    syntax_only: bool,
) -> Result<(), CliError> {
    let input = match input {
        Some(s) => Some(s),
        None if !syntax_only && !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Some(buffer)
        }
        None => None,
    };
    let config = config.map(InterpreterConfig::from_file).transpose()?;

    let options = CheckOptions {
        source,
        input,
        config,
        pretty,
        syntax_only,
    };

    match cli::execute_check(&options)? {
        CheckResult::SyntaxValid => println!("Syntax is valid"),
        CheckResult::Success(output) => {
            let json = if pretty {
                serde_json::to_string_pretty(&output)
            } else {
                serde_json::to_string(&output)
            }?;
            println!("{}", json);
        }
    }
    Ok(())
}
