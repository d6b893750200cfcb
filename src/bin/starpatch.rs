use std::borrow::Cow;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use starpatch::config::{COUNT_ENV, COUNT_PROPERTY};
use starpatch::{FixedOverrides, PatchPlan, Properties, Transformer};

/// Applies the star field patch to a single class file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Class file to read
    input: PathBuf,

    /// Where to write the patched class; nothing is written when omitted or unpatched
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Replacement star count, taking precedence over MCMS_COUNT
    #[arg(long, allow_hyphen_values = true)]
    count: Option<String>,

    /// System-property style setting, e.g. -D mcms.count=5000
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    define: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    starpatch::install_panic_hook();

    let args = Args::parse();

    let properties = Properties::parse(&args.define.join(","));
    let overrides = FixedOverrides {
        env: args.count.clone().or_else(|| env::var(COUNT_ENV).ok()),
        property: properties.get(COUNT_PROPERTY).map(str::to_string),
    };
    let transformer = Transformer::new(PatchPlan::star_field(), overrides);

    let bytes = match fs::read(&args.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: {} when reading {:?}", e, args.input);
            return ExitCode::FAILURE;
        }
    };

    let class_name = args.input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let patched = match transformer.transform(&class_name, &bytes) {
        Cow::Borrowed(_) => {
            println!("{}: unchanged", args.input.display());
            return ExitCode::SUCCESS;
        }
        Cow::Owned(patched) => patched,
    };

    println!("{}: patched", args.input.display());
    if let Some(output) = &args.output {
        if let Err(e) = fs::write(output, &patched) {
            eprintln!("Error: {} when writing {:?}", e, output);
            return ExitCode::FAILURE;
        }
        println!("wrote {}", output.display());
    }
    ExitCode::SUCCESS
}
