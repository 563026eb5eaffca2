//! Command-line interface for tickplate
//!
//! Usage:
//!   tickplate render `<path>` [--data `<file>`]       - Render a template to stdout
//!   tickplate program `<path>`                       - Print the program generated for a template
//!   tickplate lines `<path>` [--format simple|json]  - Show how each template line is classified
//!
//! `render` and `program` accept `--config <file>`, `--no-with`, `--locals <name>` and `--debug`.
//! `TICKPLATE_WITH`, `TICKPLATE_LOCALS` and `TICKPLATE_DEBUG` sit between the file and the flags.

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::fs;
use std::path::Path;
use tracing_subscriber::prelude::*;

use tickplate::tickplate::config::OptionsLoader;
use tickplate::tickplate::lexing::classify_lines;
use tickplate::{assemble, compile_file, Options, ReadError};

fn main() {
    let matches = Command::new("tickplate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compile and render backtick templates")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            option_args(Command::new("render").about("Render a template to stdout")).arg(
                Arg::new("data")
                    .long("data")
                    .short('d')
                    .help("JSON or YAML file providing the template context"),
            ),
        )
        .subcommand(option_args(
            Command::new("program").about("Print the program generated for a template"),
        ))
        .subcommand(
            Command::new("lines")
                .about("Show how each template line is classified")
                .arg(path_arg())
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Output format")
                        .value_parser(["simple", "json"])
                        .default_value("simple"),
                ),
        )
        .get_matches();

    let (name, sub_matches) = match matches.subcommand() {
        Some(subcommand) => subcommand,
        None => unreachable!(),
    };
    let debug = sub_matches
        .try_get_one::<bool>("debug")
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false);
    init_logging(debug);

    let result = match name {
        "render" => handle_render_command(sub_matches),
        "program" => handle_program_command(sub_matches),
        "lines" => handle_lines_command(sub_matches),
        _ => unreachable!(),
    };
    if let Err(message) = result {
        eprintln!("Error: {}", message);
        std::process::exit(1);
    }
}

fn path_arg() -> Arg {
    Arg::new("path")
        .help("Path to the template file")
        .required(true)
        .index(1)
}

/// Arguments shared by the commands that compile a template.
fn option_args(command: Command) -> Command {
    command
        .arg(path_arg())
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("TOML file with compilation options"),
        )
        .arg(
            Arg::new("no-with")
                .long("no-with")
                .help("Do not expose context fields as bare names")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("locals")
                .long("locals")
                .help("Name of the context parameter"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Log the generated program")
                .action(ArgAction::SetTrue),
        )
}

fn init_logging(debug: bool) {
    let default_level = if debug { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Defaults, then `--config`, then `TICKPLATE_*` variables, then individual flags.
fn load_options(matches: &ArgMatches) -> Result<Options, String> {
    let mut loader = OptionsLoader::new();
    if let Some(config) = matches.get_one::<String>("config") {
        loader = loader.with_file(config);
    }
    loader = loader.with_environment();
    if matches.get_flag("no-with") {
        loader = loader.with_scope(false);
    }
    if let Some(locals) = matches.get_one::<String>("locals") {
        loader = loader.locals(locals.as_str());
    }
    if matches.get_flag("debug") {
        loader = loader.debug(true);
    }
    loader.build().map_err(|e| format!("invalid configuration: {}", e))
}

fn read_template(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|source| {
        ReadError {
            path: path.into(),
            source,
        }
        .to_string()
    })
}

fn load_data(path: &str) -> Result<serde_json::Value, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("failed to read data {}: {}", path, e))?;
    let is_yaml = matches!(
        Path::new(path).extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    );
    if is_yaml {
        serde_yaml::from_str(&text).map_err(|e| format!("invalid YAML in {}: {}", path, e))
    } else {
        serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {}: {}", path, e))
    }
}

fn handle_render_command(matches: &ArgMatches) -> Result<(), String> {
    let path = matches
        .get_one::<String>("path")
        .ok_or("missing template path")?;
    let options = load_options(matches)?;
    let data = match matches.get_one::<String>("data") {
        Some(data) => load_data(data)?,
        None => serde_json::json!({}),
    };

    let template = compile_file(path, &options).map_err(|e| e.to_string())?;
    let output = template.render(&data).map_err(|e| e.to_string())?;
    println!("{}", output);
    Ok(())
}

fn handle_program_command(matches: &ArgMatches) -> Result<(), String> {
    let path = matches
        .get_one::<String>("path")
        .ok_or("missing template path")?;
    let options = load_options(matches)?;
    let template = read_template(path)?;
    println!("{}", assemble(&template, &options));
    Ok(())
}

fn handle_lines_command(matches: &ArgMatches) -> Result<(), String> {
    let path = matches
        .get_one::<String>("path")
        .ok_or("missing template path")?;
    let format = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("simple");
    let template = read_template(path)?;
    let lines = classify_lines(&template);

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&lines).map_err(|e| e.to_string())?;
            println!("{}", json);
        }
        _ => {
            for line in &lines {
                println!("{:>4} {:<16} {}", line.number, format!("{:?}", line.line_type), line.text);
            }
        }
    }
    Ok(())
}
