//! Example: Translating a small signal-processing script
//!
//! Demonstrates declaring variable types, translating a script with a
//! function definition, and reading the diagnostics and helper list.
//!
//! Run with: cargo run --example translate_script

use matlab_to_armadillo::{parse, Translator, TranslatorConfig};

const SCRIPT: &str = "\
function y = smooth(x, n)
  y = x;
  y(2:end-1) = (x(1:end-2) + x(2:end-1) + x(3:end)) / 3;
end

tic
[r, c] = size(A);
s = smooth(A(:, 1), r);
F = fft(s, [], 1);
peak = max(abs(F));
toc
";

fn main() {
    println!("=== Script Translation Example ===\n");

    let mut config = TranslatorConfig::new();
    config.declare("A", "mat").unwrap();
    config.declare("x", "vec").unwrap();
    config.declare("n", "uword").unwrap();

    println!("Declared:");
    for (name, datatype) in &config.declarations {
        println!("  {} {}", datatype, name);
    }
    println!();

    let mut tree = parse(SCRIPT).unwrap();
    let mut translator = Translator::with_config(config).unwrap();
    let unit = translator.translate(&mut tree);

    println!("Translation:");
    for statement in &unit.statements {
        println!("  {}", statement);
    }
    println!();

    println!("Inferred declarations:");
    for (name, datatype) in &unit.suggestions {
        println!("  {} {} ;", datatype, name);
    }
    if unit.uses_timer {
        println!("  wall_clock _timer ;");
    }
    println!();

    println!("Required helpers:");
    for include in &unit.includes {
        println!("  {}", include);
    }
    println!();

    println!("Diagnostics: {}", unit.diagnostics.len());
    for diagnostic in &unit.diagnostics {
        println!("  {}", diagnostic);
    }
}
