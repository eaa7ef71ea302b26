use std::io::{self, Read};

use clap::{Args, Parser, Subcommand};
use keepsake::RetentionConfig;
use keepsake::fragment::{Fragment, split_url};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("codec failed: {0}")]
    Codec(#[from] codec::CodecError),
}

#[derive(Parser, Debug)]
#[command(name = "keepsake", about = "Inspect and produce retained-state entries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a JSON value into a retention entry.
    Encode(EncodeArgs),
    /// Decode a retention entry back into JSON.
    Decode {
        entry: String,
    },
    /// List the entries carried by a URL or bare fragment.
    Fragment(FragmentArgs),
}

#[derive(Args, Debug)]
struct EncodeArgs {
    #[arg(help = "JSON value, or - for stdin")]
    json: String,

    #[arg(long, env = "KEEPSAKE_SAFEGUARD", default_value_t = false)]
    safeguard: bool,

    #[arg(long, help = "Treat the input as a plain string rather than JSON")]
    raw: bool,
}

#[derive(Args, Debug)]
struct FragmentArgs {
    url: String,

    #[arg(long, help = "Print entries without decoding them")]
    raw: bool,
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Encode(args) => run_encode(args),
        Command::Decode { entry } => run_decode(&entry),
        Command::Fragment(args) => run_fragment(&args),
    }
}

fn run_encode(args: EncodeArgs) -> Result<(), CliError> {
    let input = read_input(args.json)?;
    let value = if args.raw { Value::String(input) } else { serde_json::from_str(&input)? };
    println!("{}", codec::encode(Some(&value), args.safeguard)?);
    Ok(())
}

fn run_decode(entry: &str) -> Result<(), CliError> {
    match codec::decode(entry)? {
        Some(value) => print_json(&value)?,
        None => println!("undefined"),
    }
    Ok(())
}

fn run_fragment(args: &FragmentArgs) -> Result<(), CliError> {
    let (_, fragment) = split_url(&args.url);
    let text = if fragment.is_empty() && !args.url.contains("://") { args.url.as_str() } else { fragment };
    let config = RetentionConfig::from_env();
    let parsed = Fragment::parse(text, &config.missing_value_placeholder);

    let mut listing = Map::new();
    for (key, entry) in parsed.iter() {
        let value = if args.raw {
            Value::String(entry.to_owned())
        } else {
            codec::decode(entry)?.unwrap_or_else(|| Value::String(codec::UNDEFINED_SENTINEL.to_owned()))
        };
        listing.insert(key.to_owned(), value);
    }
    print_json(&Value::Object(listing))
}

fn read_input(arg: String) -> Result<String, CliError> {
    if arg != "-" {
        return Ok(arg);
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer.trim_end().to_owned())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
