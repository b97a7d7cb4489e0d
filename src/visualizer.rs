use std::collections::HashMap;
use std::fmt::Display;
use std::fs::File;
use std::io::Write;
use std::process::Command;

use color_eyre::eyre::{Result, WrapErr};
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use tracing::{info, warn};

use crate::fa::{EdgeLabel, FA};

fn format_optional<Sy: Display>(symbol: Option<&Sy>) -> String {
    match symbol {
        Some(symbol) => symbol.to_string(),
        None => "ε".to_string(),
    }
}

/// Render a transition label: `a` for a reading move, `ε` for an epsilon move and
/// `input, pop / push` for a pushdown move
pub fn format_label<Sy: Display>(label: &EdgeLabel<'_, Sy>) -> String {
    match label {
        EdgeLabel::Epsilon => "ε".to_string(),
        EdgeLabel::Symbol(symbol) => symbol.to_string(),
        EdgeLabel::Stack { input, pop, push } => {
            let pushed = if push.is_empty() {
                "ε".to_string()
            } else {
                push.iter().map(|symbol| symbol.to_string()).collect()
            };
            format!(
                "{}, {} / {}",
                format_optional(*input),
                format_optional(*pop),
                pushed
            )
        }
    }
}

/// Build a graph with one node per state and one edge per pair of connected states. Parallel
/// transitions between the same pair share an edge whose label lists all of them.
pub fn generate_graph<T>(fa: &T) -> DiGraph<String, String>
where
    T: FA,
    T::Symbol: Display,
    T::State: Display,
{
    let mut graph = DiGraph::new();
    let mut node_map: HashMap<&T::State, NodeIndex> = HashMap::new();

    // Sorted so the output is stable between runs
    let mut states: Vec<&T::State> = fa.get_states().iter().collect();
    states.sort_by_key(|state| state.to_string());

    for state in states {
        let mut label = state.to_string();
        if fa.get_acceptor_states().contains(state) {
            label = format!("Accept\n{}", label);
        }
        if fa.get_start_state() == Some(state) {
            label = format!("Start\n{}", label);
        }
        node_map.insert(state, graph.add_node(label));
    }

    let mut edges = fa.get_edges();
    edges.sort_by_key(|edge| {
        (
            edge.from.to_string(),
            edge.to.to_string(),
            format_label(&edge.label),
        )
    });

    let mut edge_map: HashMap<(NodeIndex, NodeIndex), EdgeIndex> = HashMap::new();

    for edge in edges {
        // States removed after their transitions were added still get drawn
        let from = *node_map
            .entry(edge.from)
            .or_insert_with(|| graph.add_node(edge.from.to_string()));
        let to = *node_map
            .entry(edge.to)
            .or_insert_with(|| graph.add_node(edge.to.to_string()));

        let label = format_label(&edge.label);

        match edge_map.get(&(from, to)) {
            Some(edge_idx) => {
                let old_label = &mut graph[*edge_idx];
                *old_label = format!("{}, {}", old_label, label);
            }
            None => {
                let edge_idx = graph.add_edge(from, to, label);
                edge_map.insert((from, to), edge_idx);
            }
        }
    }

    graph
}

/// Graphviz DOT source for the automaton
pub fn to_dot<T>(fa: &T) -> String
where
    T: FA,
    T::Symbol: Display,
    T::State: Display,
{
    let graph = generate_graph(fa);
    format!("{}", Dot::new(&graph))
}

/// Write `<filename>.dot` and, when Graphviz is installed, render it to `<filename>.jpg`
pub fn save_graph<T>(fa: &T, filename: &str) -> Result<()>
where
    T: FA,
    T::Symbol: Display,
    T::State: Display,
{
    let dot_filename = format!("{}.dot", filename);
    let mut dot_file = File::create(&dot_filename)
        .wrap_err_with(|| format!("Error: Failed to create dot file {}", dot_filename))?;

    dot_file
        .write_all(to_dot(fa).as_bytes())
        .wrap_err_with(|| format!("Error: Failed to write dot file {}", dot_filename))?;
    info!(file = %dot_filename, "saved transition graph");

    let image_filename = format!("{}.jpg", filename);
    match Command::new("dot")
        .args(["-Tjpg", dot_filename.as_str(), "-o", image_filename.as_str()])
        .output()
    {
        Ok(output) if output.status.success() => {
            info!(file = %image_filename, "rendered transition graph")
        }
        Ok(output) => warn!(
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr),
            "Graphviz failed to render the graph"
        ),
        Err(error) => warn!(%error, "Graphviz is not available, only the dot file was written"),
    }

    Ok(())
}
