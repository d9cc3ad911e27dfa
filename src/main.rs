// tern - Reader and REPL for the Tern language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::fmt;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser as ClapParser;
use tern_parser::{
    ConsumeError, ParseError, Parser, ParserStatus, TernVal, set_print_length,
};
use tracing::{debug, info};

#[derive(ClapParser)]
#[command(name = "tern")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Read Tern source and print the forms", long_about = None)]
struct Args {
    /// Source files to read (starts the REPL if none are given)
    files: Vec<PathBuf>,

    /// Print at most N elements of each container
    #[arg(long, value_name = "N")]
    print_length: Option<usize>,

    /// Only report syntax errors, do not print forms
    #[arg(long)]
    check: bool,
}

/// Why reading a source file stopped.
#[derive(Debug)]
enum FileError {
    Io(io::Error),
    Consume(ConsumeError),
    Syntax(ParseError),
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::Io(e) => write!(f, "{}", e),
            FileError::Consume(e) => write!(f, "{}", e),
            FileError::Syntax(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FileError {}

impl From<io::Error> for FileError {
    fn from(e: io::Error) -> Self {
        FileError::Io(e)
    }
}

impl From<ConsumeError> for FileError {
    fn from(e: ConsumeError) -> Self {
        FileError::Consume(e)
    }
}

impl From<ParseError> for FileError {
    fn from(e: ParseError) -> Self {
        FileError::Syntax(e)
    }
}

fn main() {
    let args = Args::parse();

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tern=info")),
        )
        .with_writer(io::stderr)
        .init();

    set_print_length(args.print_length);

    if args.files.is_empty() {
        run_repl();
    } else {
        run_files(&args.files, args.check);
    }
}

/// Read a sequence of source files
fn run_files(files: &[PathBuf], check: bool) {
    let mut failed = false;
    for path in files {
        let result = read_file(path, |form| {
            if !check {
                println!("{}", form);
            }
        });
        if let Err(e) = result {
            match e {
                FileError::Io(_) => eprintln!("Error reading '{}': {}", path.display(), e),
                _ => eprintln!("Error in '{}': {}", path.display(), e),
            }
            failed = true;
        }
    }
    if failed {
        process::exit(1);
    }
}

/// Read every form of a single source file, handing each to `emit`.
fn read_file(path: &Path, emit: impl FnMut(TernVal)) -> Result<usize, FileError> {
    let source = fs::read(path)?;
    info!(file = %path.display(), bytes = source.len(), "reading");
    let forms = read_source(&source, emit)?;
    debug!(file = %path.display(), forms, "done");
    Ok(forms)
}

/// Feed `source` through a fresh parser. Forms finished before a syntax
/// error are still emitted.
fn read_source(source: &[u8], mut emit: impl FnMut(TernVal)) -> Result<usize, FileError> {
    let mut parser = Parser::new();
    let mut forms = 0usize;
    let mut drain = |parser: &mut Parser| {
        while let Some(form) = parser.produce() {
            forms += 1;
            emit(form);
        }
    };

    for &c in source {
        parser.consume(c)?;
        drain(&mut parser);
        if let Some(err) = parser.error() {
            return Err(err.into());
        }
    }
    parser.eof()?;
    drain(&mut parser);
    if let Some(err) = parser.error() {
        return Err(err.into());
    }
    Ok(forms)
}

fn prompt(parser: &Parser) -> &'static str {
    match parser.status() {
        ParserStatus::Pending => "....> ",
        _ => "tern> ",
    }
}

/// Feed one REPL line. Returns the forms it finished and the syntax error
/// that cut it short, if any. The rest of a line after an error is dropped
/// along with the broken form.
fn read_line(
    parser: &mut Parser,
    line: &[u8],
) -> Result<(Vec<TernVal>, Option<ParseError>), ConsumeError> {
    let mut forms = Vec::new();
    let mut rest = line;
    while !rest.is_empty() {
        let n = parser.consume_bytes(rest)?;
        rest = &rest[n..];
        // Forms finished before an error survive it
        while let Some(form) = parser.produce() {
            forms.push(form);
        }
        if let Some(err) = parser.error() {
            return Ok((forms, Some(err)));
        }
    }
    Ok((forms, None))
}

/// Run the interactive REPL
///
/// One parser lives for the whole session, so a form may span lines.
fn run_repl() {
    println!("Tern v{}", env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut parser = Parser::new();

    loop {
        print!("{}", prompt(&parser));
        if let Err(e) = io::stdout().flush() {
            eprintln!("Write error: {}", e);
            break;
        }

        let mut line = Vec::new();
        match input.read_until(b'\n', &mut line) {
            Ok(0) => {
                println!();
                if parser.eof().is_ok() {
                    while let Some(form) = parser.produce() {
                        println!("{}", form);
                    }
                    if let Some(err) = parser.error() {
                        eprintln!("{}", err);
                    }
                }
                break;
            }
            Ok(_) => match read_line(&mut parser, &line) {
                Ok((forms, err)) => {
                    for form in forms {
                        println!("{}", form);
                    }
                    if let Some(err) = err {
                        eprintln!("{}", err);
                    }
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return;
                }
            },
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
    }
}
