use automata::{load_machine, SearchConfig};
use clap::{Arg, ArgAction, ArgMatches, Command};
use color_eyre::eyre::{bail, Result, WrapErr};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn build_cli() -> Command {
    Command::new("automata")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Test words for membership against a nondeterministic finite-state or pushdown automaton")
        .arg(
            Arg::new("machine")
                .short('m')
                .long("machine")
                .value_name("MACHINE FILE")
                .help("JSON description of the automaton to run")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("word")
                .short('w')
                .long("word")
                .value_name("WORD")
                .help("Word to test. Every character is one input symbol. May be given several times")
                .action(ArgAction::Append)
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("words-file")
                .short('f')
                .long("words-file")
                .value_name("WORDS FILE")
                .help("File with one word to test per line. An empty line is the empty word")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("max-depth")
                .short('d')
                .long("max-depth")
                .value_name("TRANSITIONS")
                .help("Give up on a branch after this many transitions. Unbounded by default")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("frontier")
                .long("frontier")
                .help("Simulate all branches at once instead of backtracking. Finite-state machines only")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("show-stack")
                .short('s')
                .long("show-stack")
                .help("Print the final stack of accepted words, top first. Pushdown machines only")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("save-graph")
                .short('g')
                .long("save-graph")
                .value_name("NAME")
                .help("Save the transition graph as NAME.dot, and NAME.jpg if Graphviz is installed")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log more. Repeat for more detail. RUST_LOG takes precedence")
                .action(ArgAction::Count),
        )
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_words_file(file_path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(file_path).wrap_err_with(|| {
        format!(
            "Error: Failed to read the words file {}",
            file_path.display()
        )
    })?;
    Ok(contents.lines().map(str::to_string).collect())
}

fn collect_words(args: &ArgMatches) -> Result<Vec<String>> {
    let mut words: Vec<String> = args
        .get_many::<String>("word")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    if let Some(words_file) = args.get_one::<PathBuf>("words-file") {
        words.extend(read_words_file(words_file)?);
    }

    if words.is_empty() {
        bail!("Error: Provide at least one word with --word or --words-file");
    }
    Ok(words)
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = build_cli().get_matches();
    init_logging(args.get_count("verbose"));

    let machine_path = match args.get_one::<PathBuf>("machine") {
        Some(path) => path,
        None => bail!("Error: Machine description file not provided!"),
    };

    let mut machine = load_machine(machine_path)?;

    if let Some(max_depth) = args.get_one::<usize>("max-depth") {
        machine.set_search_config(SearchConfig::with_max_depth(*max_depth));
    }

    if let Some(graph_name) = args.get_one::<String>("save-graph") {
        machine.save_graph(graph_name)?;
    }

    let words = collect_words(&args)?;
    let frontier = args.get_flag("frontier");
    let show_stack = args.get_flag("show-stack");

    debug!(count = words.len(), frontier, "testing words");

    for word in &words {
        let verdict = machine.accept_word(word, frontier)?;
        let outcome = if verdict.accepted { "accept" } else { "reject" };
        println!("{}\t{}", word, outcome);

        if show_stack && verdict.accepted {
            if let Some(stack) = verdict.stack {
                let top_first: String = stack.iter().rev().collect();
                println!("\tstack: [{}]", top_first);
            }
        }
    }

    Ok(())
}
