use std::fs::File;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use beebdfs::basic::{describe_dialects, Decoder, Dialect, DEFAULT_DIALECT_NAME};
use clap::Parser;

#[derive(Parser)]
#[command(name = "bbc2text")]
#[command(version = "0.1.0")]
#[command(about = "Convert tokenized BBC BASIC files to readable text", long_about = None)]
struct Cli {
    /// BASIC dialect of the input files (use --dialect=help for a list)
    #[arg(long, default_value = DEFAULT_DIALECT_NAME)]
    dialect: String,

    /// LISTO value controlling the listing format (0..7)
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u8).range(0..=7))]
    listo: u8,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,

    /// Input files; use "-" to read standard input
    files: Vec<String>,
}

fn decode_one(decoder: &Decoder, name: &str) -> bool {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = if name == "-" {
        decoder.decode_file(&mut io::stdin().lock(), &mut out)
    } else {
        match File::open(name) {
            Ok(mut f) => decoder.decode_file(&mut f, &mut out),
            Err(e) => {
                eprintln!("{name}: {e}");
                return false;
            }
        }
    };
    if let Err(e) = result {
        eprintln!("{name}: {e}");
        return false;
    }
    out.flush().map_err(|e| eprintln!("stdout: {e}")).is_ok()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if cli.dialect == "help" {
        print!("{}", describe_dialects(DEFAULT_DIALECT_NAME));
        return ExitCode::SUCCESS;
    }
    let dialect = match Dialect::from_name(&cli.dialect) {
        Some(d) => d,
        None => {
            eprintln!("Unknown BASIC dialect '{}'", cli.dialect);
            eprint!("{}", describe_dialects(DEFAULT_DIALECT_NAME));
            return ExitCode::FAILURE;
        }
    };
    if cli.files.is_empty() {
        eprintln!("You didn't specify any input files.");
        return ExitCode::FAILURE;
    }

    let decoder = Decoder::new(dialect, cli.listo);
    let mut failed = false;
    for name in &cli.files {
        if !decode_one(&decoder, name) {
            failed = true;
        }
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
