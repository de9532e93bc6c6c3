//! Matrix Script to Armadillo Translator CLI
//!
//! Usage:
//!   mat2arma "y = A * x" -d A=mat -d x=vec
//!   mat2arma -f script.m -c declarations.json
//!   mat2arma "[r, c] = size(A)" -d A=mat --json

use clap::Parser as ClapParser;
use colored::Colorize;
use std::fs;
use std::io::{self, Read};

use matlab_to_armadillo::{
    parse, CompileResult, Severity, TranslationUnit, Translator, TranslatorConfig,
};

#[derive(ClapParser, Debug)]
#[command(name = "mat2arma")]
#[command(author = "FPGA Team")]
#[command(version = "0.1.0")]
#[command(about = "Translates matrix scripts into typed Armadillo C++")]
struct Args {
    /// Script to translate (e.g., "y = A * x")
    #[arg(value_name = "SOURCE")]
    source: Option<String>,

    /// Read the script from file
    #[arg(short = 'f', long = "file")]
    input_file: Option<String>,

    /// Declare variable types (e.g., "A=mat")
    #[arg(short = 'd', long = "declare", value_parser = parse_declaration)]
    declarations: Vec<(String, String)>,

    /// JSON configuration file
    #[arg(short = 'c', long = "config")]
    config_file: Option<String>,

    /// Output the translation unit as JSON
    #[arg(short = 'j', long = "json")]
    json_output: bool,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn parse_declaration(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.split('=').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(format!("Invalid declaration format: {}", s));
    }
    Ok((parts[0].trim().to_string(), parts[1].trim().to_string()))
}

fn read_source(file: Option<&str>) -> CompileResult<String> {
    match file {
        Some(file) => Ok(fs::read_to_string(file)?),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn fail(what: &str, error: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", what.red(), error);
    std::process::exit(1);
}

fn main() {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    // Get the script from argument, file, or stdin
    let source = match args.source {
        Some(source) => source,
        None => read_source(args.input_file.as_deref())
            .unwrap_or_else(|e| fail("Failed to read script", e)),
    };

    let mut config = match &args.config_file {
        Some(file) => TranslatorConfig::from_file(file).unwrap_or_else(|e| fail("Config error", e)),
        None => TranslatorConfig::new(),
    };
    for (name, type_name) in &args.declarations {
        config
            .declare(name, type_name)
            .unwrap_or_else(|e| fail("Declaration error", e));
    }

    if args.verbose {
        println!("{}", "Matrix Script to Armadillo Translator".bold().blue());
        println!("{}", "=".repeat(37));
        println!();
        println!("{}: {}", "Input".green(), source.trim());
        for (name, datatype) in &config.declarations {
            println!("{}: {} {}", "Declared".green(), datatype, name);
        }
        println!();
    }

    let warnings_as_errors = config.warnings_as_errors;
    let mut tree = parse(&source).unwrap_or_else(|e| fail("Parse error", e));
    let mut translator = Translator::with_config(config).unwrap_or_else(|e| fail("Config error", e));
    let unit = translator.translate(&mut tree);

    if args.json_output {
        match unit.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => fail("Error", format!("Failed to serialize to JSON: {}", e)),
        }
    } else {
        print_unit(&unit, args.verbose);
    }

    let failed = unit.has_errors() || (warnings_as_errors && unit.warnings().next().is_some());
    if failed {
        std::process::exit(1);
    }
}

fn print_unit(unit: &TranslationUnit, verbose: bool) {
    if verbose {
        println!("{}", "Translation".bold().green());
        println!("{}", "-".repeat(50));
    }
    for statement in &unit.statements {
        println!("{}", statement);
    }

    if verbose {
        println!();
        if !unit.suggestions.is_empty() {
            println!("{}", "Declarations".bold().yellow());
            for (name, datatype) in &unit.suggestions {
                println!("  {} {} ;", datatype, name);
            }
        }
        if unit.uses_timer {
            println!("  wall_clock _timer ;");
        }
        if !unit.includes.is_empty() {
            println!("{}", "Helpers".bold().yellow());
            for include in &unit.includes {
                println!("  {}", include);
            }
        }
    }

    for diagnostic in &unit.diagnostics {
        let severity = match diagnostic.severity {
            Severity::Error => diagnostic.severity.to_string().red().bold(),
            Severity::Warning => diagnostic.severity.to_string().yellow().bold(),
        };
        eprintln!(
            "{} [{}] {} '{}': {}",
            severity,
            diagnostic.kind,
            format!("{:?}", diagnostic.category).cyan(),
            diagnostic.label,
            diagnostic.message
        );
    }
}
