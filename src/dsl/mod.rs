//! DSL (Domain Specific Language) parser for circuit descriptions.
//!
//! This module provides a SPICE-inspired text-based language for describing
//! guitar pedal circuits. The DSL is line-oriented and human-editable.
//!
//! # Grammar Overview
//!
//! ```text
//! circuit     = { line }
//! line        = comment | directive | component | empty
//! comment     = ('#' | ';') { any_char }
//! directive   = '.' directive_name { argument }
//! component   = type name node+ [value] [model_ref] { key '=' value }
//!
//! directive_name = "node" | "model" | "input" | "output" | "param"
//!                 | "probe" | "warmup" | "ic" | "ctrl" | "include"
//! type        = "R" | "W" | "C" | "L" | "D" | "Q" | "V" | "B" | "E"
//!             | "O" | "P" | "A" | "X"
//! name        = identifier
//! node        = identifier | "0" | "GND"
//! value       = number [unit_suffix]
//! model_ref   = identifier
//!
//! number      = ['-'] digit+ ['.' digit+] [('e'|'E') ['-'|'+'] digit+]
//! unit_suffix = 'f' | 'p' | 'n' | 'u' | 'm' | 'k' | 'M' | 'G'
//! identifier  = (letter | '_') { letter | digit | '_' }
//! string      = '"' { any_char except '"' or newline } '"'
//! ```
//!
//! # Component Types
//!
//! | Type | Description | Syntax |
//! |------|-------------|--------|
//! | R | Resistor | `R<name> <n+> <n-> <value>` |
//! | W | Wire | `W<name> <n1> <n2>` |
//! | C | Capacitor | `C<name> <n+> <n-> <value>` |
//! | L | Inductor | `L<name> <n+> <n-> <value>` |
//! | D | Diode | `D<name> <anode> <cathode> [model]` |
//! | Q | BJT | `Q<name> <collector> <base> <emitter> [model]` |
//! | V | Voltage Source | `V<name> <n+> <n-> <value>` |
//! | B | Behavioral Voltage Source | `B<name> <n+> <n-> V="<expr>"` |
//! | E | VCVS | `E<name> <out+> <out-> <ctrl+> <ctrl-> <gain>` |
//! | O | Op-Amp | `O<name> <out> <in+> <in-> <v+> <v-> [model]` |
//! | P | Potentiometer | `P<name> <n1> <n2> <wiper> <value> [taper=LIN|LOG] param=<name>` |
//! | A | Parameter Evaluator | `A<name> <target>="<expr>"` |
//! | X | Subcircuit stub | `X<name> <in> <out> <kind>` |
//!
//! # Directives
//!
//! | Directive | Description | Syntax |
//! |-----------|-------------|--------|
//! | .node | Declare a node | `.node <name>` |
//! | .model | Define a component model | `.model <name> <type> (<params>)` |
//! | .input | Mark audio input node | `.input <node> [Z=<value>]` |
//! | .output | Mark audio output node | `.output <node>` |
//! | .param | Declare a global parameter | `.param <name> <value>` |
//! | .probe | Record a node voltage or component current | `.probe V(<node>)` or `.probe I(<comp>)` |
//! | .warmup | Seconds to run before recording output | `.warmup <seconds>` |
//! | .ic | Set a capacitor's initial voltage | `.ic <cap> <volts>` |
//! | .ctrl | Bind a control-surface element to a parameter | `.ctrl <id> <param> <min> <max> <step>` |
//! | .include | Splice another netlist file in at this point | `.include <path>` |
//!
//! # Example
//!
//! ```text
//! # RC Low-pass filter
//! .input in
//! .output out
//!
//! V1   in   0    1.0
//! R1   in   out  10k
//! C1   out  0    100n
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::error::{PedalerError, Result};

/// Parse a circuit DSL string into an AST.
pub fn parse(input: &str) -> Result<CircuitAst> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer);
    parser.parse()
}

/// Parse a circuit DSL file, resolving `.include` directives by textual
/// splicing before tokenization.
#[cfg(feature = "cli")]
pub fn parse_file(path: &std::path::Path) -> Result<CircuitAst> {
    let content = read_with_includes(path, 0)?;
    parse(&content)
}

#[cfg(feature = "cli")]
fn read_with_includes(path: &std::path::Path, depth: usize) -> Result<String> {
    const MAX_INCLUDE_DEPTH: usize = 16;
    if depth > MAX_INCLUDE_DEPTH {
        return Err(PedalerError::FileReadError {
            path: path.display().to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::Other,
                "`.include` nesting too deep (possible cycle)",
            ),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| PedalerError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    let base_dir = path.parent().map(|p| p.to_path_buf()).unwrap_or_default();

    let mut spliced = String::with_capacity(content.len());
    for line in content.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix(".include") {
            let included = rest.trim().trim_matches('"');
            let included_path = base_dir.join(included);
            spliced.push_str(&read_with_includes(&included_path, depth + 1)?);
            spliced.push('\n');
        } else {
            spliced.push_str(line);
            spliced.push('\n');
        }
    }
    Ok(spliced)
}
