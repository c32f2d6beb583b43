// SPDX-License-Identifier: MIT

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use selector_rs::loader::SelectorLoader;
use selector_rs::query::tokenize;
use selector_rs::{Options, QueryProgram, Selector, SelectorBuilder, SelectorRegistry};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the tokens of a path expression
    Tokens {
        /// The path expression
        path: String,
    },
    /// Evaluate a path expression against a YAML or JSON file
    Query {
        /// The path expression
        path: String,

        /// Input document
        #[arg(short, long)]
        input: PathBuf,

        /// Match member names case-sensitively
        #[arg(long)]
        case_sensitive: bool,
    },
    /// Evaluate selectors against each target in a file
    Select {
        /// File of selector resources
        #[arg(short, long)]
        file: PathBuf,

        /// Input targets; a top-level sequence is treated as many targets
        #[arg(short, long)]
        input: PathBuf,

        /// Only evaluate the named selector
        #[arg(short, long)]
        name: Option<String>,

        /// Options file
        #[arg(short, long)]
        options: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Tokens { path } => {
            for token in tokenize(&path)? {
                println!("{:?}", token);
            }
        }
        Commands::Query {
            path,
            input,
            case_sensitive,
        } => {
            let program = QueryProgram::compile(&path)?;
            let target = read_document(&input)?;
            match program.evaluate(&target, case_sensitive) {
                Some(value) => {
                    let values: Vec<JsonValue> = value.into_vec().into_iter().cloned().collect();
                    let output = if program.is_sequence() {
                        JsonValue::Array(values)
                    } else {
                        values.into_iter().next().unwrap_or(JsonValue::Null)
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                None => {
                    log::info!("path '{}' was not found", program.source());
                    std::process::exit(1);
                }
            }
        }
        Commands::Select {
            file,
            input,
            name,
            options,
        } => {
            let options = Options::discover(options.as_deref())?;
            let loader = SelectorLoader::new(SelectorBuilder::new(&options));
            let registry = SelectorRegistry::new();
            let failures = loader
                .load_into(&file, &registry)
                .with_context(|| format!("failed to load selectors from {}", file.display()))?;
            for failure in &failures {
                eprintln!("error: {}", failure);
            }
            let selectors = match &name {
                Some(name) => vec![registry.require(name)?],
                None => registry.all(),
            };
            log::info!("loaded {} selectors", selectors.len());

            let targets = match read_document(&input)? {
                JsonValue::Array(items) => items,
                target => vec![target],
            };
            for (i, target) in targets.iter().enumerate() {
                for selector in &selectors {
                    report(i, selector, target, &options);
                }
            }
        }
    }

    Ok(())
}

fn read_document(path: &Path) -> anyhow::Result<JsonValue> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn report(index: usize, selector: &Selector, target: &JsonValue, options: &Options) {
    let result = selector.evaluate_at(target, options, &format!("[{}]", index));
    println!("[{}] {}: {}", index, selector.name(), result.outcome);
    for reason in &result.reasons {
        println!("    {} (at {})", reason, reason.full_path());
    }
}
