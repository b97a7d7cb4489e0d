/* Machine descriptions. A JSON file describes either a finite-state or a pushdown automaton over
 * single character symbols and string state labels. Loading a description runs every element
 * through the same validation as the engine's own mutators. */

use color_eyre::eyre::{Report, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

use crate::fa::{AutomatonError, SearchConfig};
use crate::nfa::{FiniteStateAutomaton, FsaTransition};
use crate::pda::{PdaTransition, PushdownAutomaton};
use crate::visualizer;

pub type CharFsa = FiniteStateAutomaton<char, String>;
pub type CharPda = PushdownAutomaton<char, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MachineDescription {
    Finite(FiniteDescription),
    Pushdown(PushdownDescription),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiniteDescription {
    pub alphabet: Vec<char>,
    pub states: Vec<String>,
    #[serde(default)]
    pub initial: Option<String>,
    #[serde(default)]
    pub accepting: Vec<String>,
    #[serde(default)]
    pub transitions: Vec<FiniteTransitionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiniteTransitionEntry {
    pub from: String,
    /// Missing means epsilon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<char>,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushdownDescription {
    pub alphabet: Vec<char>,
    pub stack_alphabet: Vec<char>,
    pub states: Vec<String>,
    #[serde(default)]
    pub initial: Option<String>,
    #[serde(default)]
    pub accepting: Vec<String>,
    #[serde(default)]
    pub transitions: Vec<PushdownTransitionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushdownTransitionEntry {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<char>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pop: Option<char>,
    pub to: String,
    #[serde(default)]
    pub push: Vec<char>,
}

/// List of possible errors while loading a machine description
#[derive(Debug)]
pub enum MachineError {
    FileOpenError(String),
    FileReadError(String),
    ParseError(String),
    InvalidMachine(AutomatonError<char, String>),
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineError::FileOpenError(err_line) => write!(f, "{}", err_line),
            MachineError::FileReadError(err_line) => write!(f, "{}", err_line),
            MachineError::ParseError(err_line) => {
                write!(f, "Error: Malformed machine description: {}", err_line)
            }
            MachineError::InvalidMachine(err) => {
                write!(f, "Error: Machine description is not a valid automaton. {}", err)
            }
        }
    }
}

impl std::error::Error for MachineError {}

impl From<AutomatonError<char, String>> for MachineError {
    fn from(err: AutomatonError<char, String>) -> Self {
        MachineError::InvalidMachine(err)
    }
}

impl FiniteDescription {
    pub fn build(&self) -> Result<CharFsa, AutomatonError<char, String>> {
        CharFsa::from_parts(
            self.alphabet.iter().copied(),
            self.states.iter().cloned(),
            self.initial.clone(),
            self.transitions.iter().map(|entry| FsaTransition {
                origin: entry.from.clone(),
                symbol: entry.symbol,
                destination: entry.to.clone(),
            }),
            self.accepting.iter().cloned(),
        )
    }
}

impl PushdownDescription {
    pub fn build(&self) -> Result<CharPda, AutomatonError<char, String>> {
        CharPda::from_parts(
            self.alphabet.iter().copied(),
            self.stack_alphabet.iter().copied(),
            self.states.iter().cloned(),
            self.initial.clone(),
            self.transitions.iter().map(|entry| {
                PdaTransition::new(
                    entry.from.clone(),
                    entry.input,
                    entry.pop,
                    entry.to.clone(),
                    entry.push.clone(),
                )
            }),
            self.accepting.iter().cloned(),
        )
    }
}

impl MachineDescription {
    pub fn build(&self) -> Result<Machine, MachineError> {
        let machine = match self {
            MachineDescription::Finite(description) => Machine::Finite(description.build()?),
            MachineDescription::Pushdown(description) => Machine::Pushdown(description.build()?),
        };
        Ok(machine)
    }
}

/// A loaded automaton of either kind
#[derive(Debug, Clone)]
pub enum Machine {
    Finite(CharFsa),
    Pushdown(CharPda),
}

/// Result of testing one word. `stack` is only reported by pushdown machines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub accepted: bool,
    pub stack: Option<Vec<char>>,
}

/// List of possible errors while running a loaded machine
#[derive(Debug)]
pub enum RunError {
    /// Frontier simulation was requested for a pushdown machine
    FrontierUnsupported,
    Search(AutomatonError<char, String>),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::FrontierUnsupported => write!(
                f,
                "Error: Frontier simulation is only available for finite-state machines!"
            ),
            RunError::Search(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for RunError {}

impl Machine {
    pub fn kind(&self) -> &'static str {
        match self {
            Machine::Finite(_) => "finite",
            Machine::Pushdown(_) => "pushdown",
        }
    }

    pub fn set_search_config(&mut self, config: SearchConfig) {
        match self {
            Machine::Finite(fsa) => fsa.set_search_config(config),
            Machine::Pushdown(pda) => pda.set_search_config(config),
        }
    }

    /// Test a word, one symbol per character
    pub fn accept_word(&self, word: &str, frontier: bool) -> Result<Verdict, RunError> {
        let verdict = match self {
            Machine::Finite(fsa) => {
                let accepted = if frontier {
                    fsa.accept_by_frontier(word.chars())
                } else {
                    fsa.accept(word.chars())
                };
                Verdict {
                    accepted: accepted.map_err(RunError::Search)?,
                    stack: None,
                }
            }
            Machine::Pushdown(_) if frontier => return Err(RunError::FrontierUnsupported),
            Machine::Pushdown(pda) => {
                let run = pda.accept(word.chars()).map_err(RunError::Search)?;
                Verdict {
                    accepted: run.accepted,
                    stack: Some(run.stack),
                }
            }
        };
        Ok(verdict)
    }

    /// Write the transition graph to `<filename>.dot`
    pub fn save_graph(&self, filename: &str) -> Result<()> {
        match self {
            Machine::Finite(fsa) => visualizer::save_graph(fsa, filename),
            Machine::Pushdown(pda) => visualizer::save_graph(pda, filename),
        }
    }
}

/// Parse the text of a machine description
pub fn parse_machine_description(text: &str) -> Result<MachineDescription, MachineError> {
    serde_json::from_str(text).map_err(|error| MachineError::ParseError(error.to_string()))
}

/// Read and parse a machine description file
pub fn read_machine_file(file_path: impl AsRef<Path>) -> Result<MachineDescription, MachineError> {
    let file_path = file_path.as_ref();

    let file = match File::open(file_path) {
        Ok(file) => file,
        Err(error) => {
            let err_line = format!(
                "Error: Failed to open the machine file {}: {}",
                file_path.display(),
                error
            );
            return Err(MachineError::FileOpenError(err_line));
        }
    };

    let mut text = String::new();
    if let Err(error) = BufReader::new(file).read_to_string(&mut text) {
        let err_line = format!(
            "Error: Failed to read the machine file {}: {}",
            file_path.display(),
            error
        );
        return Err(MachineError::FileReadError(err_line));
    }

    parse_machine_description(&text)
}

/// Read a machine description file and build the automaton it describes
pub fn load_machine(file_path: impl AsRef<Path>) -> Result<Machine> {
    let file_path = file_path.as_ref();
    let description = read_machine_file(file_path)?;
    let machine = description.build().map_err(Report::new)?;
    info!(
        path = %file_path.display(),
        kind = machine.kind(),
        "loaded machine"
    );
    Ok(machine)
}
