//! # automata
//!
//! Generic nondeterministic automata, parameterized over the input symbol type and the state
//! label type.
//!
//! This library provides functionality to:
//! - Build finite-state automata with epsilon transitions and test words for membership
//! - Build pushdown automata that accept by final state and test words for membership
//! - Load either kind of machine from a JSON description
//! - Export the transition graph as Graphviz DOT

pub mod fa;
pub mod machine;
pub mod nfa;
pub mod pda;
pub mod visualizer;

// Re-export commonly used items for convenience
pub use fa::{AutomatonError, SearchConfig, ValidatedLabelSet, FA};
pub use machine::{load_machine, parse_machine_description, read_machine_file, Machine};
pub use nfa::{FiniteStateAutomaton, FsaTransition};
pub use pda::{PdaRun, PdaTransition, PushdownAutomaton};
pub use visualizer::{save_graph, to_dot};
