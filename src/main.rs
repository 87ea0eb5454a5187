use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use env_logger::Builder;
use log::{debug, info};

use letlox::ast_printer::AstPrinter;
use letlox::diagnostics::Reporter;
use letlox::parser::Parser;
use letlox::scanner::Scanner;
use letlox::Lox;

/// Exit status after lexical, syntax or resolution errors (or bad usage).
const EXIT_STATIC_ERROR: i32 = 1;

/// Exit status after an uncaught runtime error.
const EXIT_RUNTIME_ERROR: i32 = 2;

#[derive(ClapParser, Debug)]
#[command(name = "letlox", version, about = "letlox language interpreter", long_about = None)]
pub struct Cli {
    /// Script to run; starts an interactive prompt when omitted
    scripts: Vec<PathBuf>,

    /// Enable logging to app.log
    #[arg(long)]
    log: bool,

    /// Print the token stream instead of running
    #[arg(long, conflicts_with = "ast")]
    tokens: bool,

    /// With --tokens, print one JSON object per token
    #[arg(long, requires = "tokens")]
    json: bool,

    /// Print the parsed statements in prefix form instead of running
    #[arg(long)]
    ast: bool,
}

/// What to do with each chunk of source.
#[derive(Debug, Clone, Copy)]
enum Mode {
    Run,
    Tokens { json: bool },
    Ast,
}

impl From<&Cli> for Mode {
    fn from(cli: &Cli) -> Self {
        if cli.tokens {
            Mode::Tokens { json: cli.json }
        } else if cli.ast {
            Mode::Ast
        } else {
            Mode::Run
        }
    }
}

/// Reads the contents of a file as UTF‑8 text.
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    String::from_utf8(buf).context(format!("File {:?} is not valid UTF-8", filename))
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("letlox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "{} [{}:{}] {} - {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                module,
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Prints every token (or lexical error).  Returns `true` if any error was seen.
fn dump_tokens(source: &str, json: bool) -> Result<bool> {
    let mut failed = false;

    for result in Scanner::new(source) {
        match result {
            Ok(token) if json => println!("{}", serde_json::to_string(&token)?),
            Ok(token) => println!("{}", token),
            Err(e) => {
                failed = true;
                eprintln!("{}", e);
            }
        }
    }

    Ok(failed)
}

/// Prints each parsed statement.  Returns `true` if any error was reported.
fn dump_ast(source: &str) -> bool {
    let mut reporter = Reporter::new(io::stderr());
    let tokens = Scanner::new(source).scan_tokens(&mut reporter);
    let statements = Parser::new(tokens).parse(&mut reporter);

    for stmt in &statements {
        println!("{}", AstPrinter::print_stmt(stmt));
    }

    reporter.had_error()
}

fn run_file<W: Write, E: Write>(lox: &mut Lox<W, E>, path: &Path, mode: Mode) -> Result<i32> {
    let source = read_file(path)?;

    let failed = match mode {
        Mode::Tokens { json } => dump_tokens(&source, json)?,
        Mode::Ast => dump_ast(&source),
        Mode::Run => {
            lox.run(&source);

            if lox.had_runtime_error() {
                return Ok(EXIT_RUNTIME_ERROR);
            }

            lox.had_error()
        }
    };

    Ok(if failed { EXIT_STATIC_ERROR } else { 0 })
}

fn run_prompt<W: Write, E: Write>(lox: &mut Lox<W, E>, mode: Mode) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        print!(">>> ");
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        debug!("REPL line: {:?}", line);

        match mode {
            Mode::Tokens { json } => {
                dump_tokens(&line, json)?;
            }
            Mode::Ast => {
                dump_ast(&line);
            }
            Mode::Run => lox.run(&line),
        }

        lox.reset_error();
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let mode = Mode::from(&args);
    let mut lox = Lox::new(io::stdout(), io::stderr());

    match args.scripts.as_slice() {
        [] => run_prompt(&mut lox, mode)?,

        [path] => {
            let code = run_file(&mut lox, path, mode)?;
            info!("Exiting with status {}", code);
            process::exit(code);
        }

        _ => {
            println!("Usage: letlox [script]");
            process::exit(EXIT_STATIC_ERROR);
        }
    }

    Ok(())
}
