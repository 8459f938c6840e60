#![allow(unused_assignments)]

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use promql_editor::{
    init_logger, new_complete_strategy, new_lint_strategy, parse, Config, PromqlError,
    PromqlResult,
};

/// PromQL linter and completion engine
///
/// Type checks PromQL expressions, suggests completions, and serves both
/// over the Language Server Protocol.
#[derive(Parser)]
#[command(name = "promql-editor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Config file (default: $PROMQL_EDITOR_CONFIG or ./promql-editor.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Prometheus server to fetch metric and label names from
    #[arg(long, global = true)]
    url: Option<String>,

    /// Only offer static terms; never contact a server
    #[arg(long, global = true)]
    offline: bool,

    /// Treat --url as a remote PromQL language server
    #[arg(long, global = true)]
    remote_lsp: bool,

    /// Log filter, e.g. "debug" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report problems in an expression
    Check {
        /// Expression to check, or "-" for stdin
        expr: Option<String>,

        /// Read the expression from a file
        #[arg(short, long, conflicts_with = "expr")]
        file: Option<PathBuf>,

        /// Print diagnostics as JSON instead of a report
        #[arg(long)]
        json: bool,
    },

    /// Print completions for a cursor position as JSON
    Complete {
        /// Expression to complete, or "-" for stdin
        expr: String,

        /// Byte offset of the cursor (default: end of the expression)
        #[arg(short, long)]
        pos: Option<usize>,
    },

    /// Print the syntax tree of an expression
    Parse {
        /// Expression to parse, or "-" for stdin
        expr: String,
    },

    /// Start the language server on stdio
    Lsp,
}

fn main() -> ExitCode {
    // Set up miette for nice error output
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();

    let result = load_config(&cli.global).and_then(|config| {
        init_logger(config.log_level.as_deref());
        match cli.command {
            Commands::Check { expr, file, json } => cmd_check(&config, expr, file, json),
            Commands::Complete { expr, pos } => cmd_complete(&config, expr, pos),
            Commands::Parse { expr } => cmd_parse(expr),
            Commands::Lsp => cmd_lsp(&config),
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let exit_code = match &e {
                PromqlError::IoError { .. } => ExitCode::from(3),
                PromqlError::Config { .. } => ExitCode::from(2),
                _ => ExitCode::from(1),
            };
            eprintln!("{:?}", miette::Report::new(e));
            exit_code
        }
    }
}

fn load_config(args: &GlobalArgs) -> PromqlResult<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(url) = &args.url {
        config.complete.url = url.clone();
        config.complete.offline = false;
    }
    if args.offline {
        config.complete.offline = true;
    }
    if args.remote_lsp {
        config.complete.enable_lsp = true;
    }
    if args.log_level.is_some() {
        config.log_level = args.log_level.clone();
    }
    Ok(config)
}

fn runtime() -> PromqlResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PromqlError::io_error(format!("failed to create runtime: {}", e)))
}

fn read_expression(expr: Option<String>, file: Option<PathBuf>) -> PromqlResult<String> {
    if let Some(path) = file {
        return std::fs::read_to_string(&path).map_err(|e| {
            PromqlError::io_error(format!("failed to read {}: {}", path.display(), e))
        });
    }
    match expr {
        Some(expr) if expr != "-" => Ok(expr),
        _ => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .map_err(|e| PromqlError::io_error(format!("failed to read stdin: {}", e)))?;
            Ok(source.trim_end_matches(['\n', '\r']).to_string())
        }
    }
}

fn cmd_check(
    config: &Config,
    expr: Option<String>,
    file: Option<PathBuf>,
    json: bool,
) -> PromqlResult<()> {
    let source = read_expression(expr, file)?;
    let lint = new_lint_strategy(&config.complete)?;
    let diagnostics = runtime()?.block_on(lint.promql(&source));

    if json {
        let out = serde_json::to_string_pretty(&diagnostics)
            .map_err(|e| PromqlError::io_error(format!("failed to encode diagnostics: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    match PromqlError::from_diagnostics(&source, &diagnostics) {
        Some(err) => Err(err),
        None => {
            eprintln!("OK");
            Ok(())
        }
    }
}

fn cmd_complete(config: &Config, expr: String, pos: Option<usize>) -> PromqlResult<()> {
    let source = read_expression(Some(expr), None)?;
    let pos = pos.unwrap_or(source.len());
    let complete = new_complete_strategy(&config.complete)?;
    let result = runtime()?.block_on(complete.promql(&source, pos));

    let out = match result {
        Some(result) => serde_json::json!({
            "from": result.from,
            "to": result.to,
            "span": result.span.as_ref().map(|r| r.as_str()),
            "options": result.options,
        }),
        None => serde_json::Value::Null,
    };
    let out = serde_json::to_string_pretty(&out)
        .map_err(|e| PromqlError::io_error(format!("failed to encode completions: {}", e)))?;
    println!("{}", out);
    Ok(())
}

fn cmd_parse(expr: String) -> PromqlResult<()> {
    let source = read_expression(Some(expr), None)?;
    println!("{}", parse(&source));
    Ok(())
}

fn cmd_lsp(config: &Config) -> PromqlResult<()> {
    let complete = new_complete_strategy(&config.complete)?;
    let lint = new_lint_strategy(&config.complete)?;

    let rt = runtime()?;
    rt.block_on(promql_editor::lsp::run_server(
        Arc::from(complete),
        Arc::from(lint),
    ));
    Ok(())
}
