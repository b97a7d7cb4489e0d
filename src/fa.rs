use std::collections::hash_set::Iter;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

/// A set of labels (input symbols, stack symbols or states) that automaton operations validate
/// against. Lookups that fail hand the offending label to a caller supplied error constructor so
/// each engine can report it with the right error kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLabelSet<T: Eq + Hash> {
    labels: HashSet<T>,
}

pub type Alphabet<Sy> = ValidatedLabelSet<Sy>;
pub type StateSet<St> = ValidatedLabelSet<St>;

impl<T: Eq + Hash> Default for ValidatedLabelSet<T> {
    fn default() -> Self {
        ValidatedLabelSet {
            labels: HashSet::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> ValidatedLabelSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label. Returns false if it was already present.
    pub fn insert(&mut self, label: T) -> bool {
        self.labels.insert(label)
    }

    pub fn contains(&self, label: &T) -> bool {
        self.labels.contains(label)
    }

    /// Check that `label` is a member, building the error from a copy of the label otherwise
    pub fn require<E>(&self, label: &T, error: impl FnOnce(T) -> E) -> Result<(), E> {
        if self.labels.contains(label) {
            Ok(())
        } else {
            Err(error(label.clone()))
        }
    }

    /// Remove a member label. A label that is not present is an error, never a silent miss.
    pub fn remove<E>(&mut self, label: &T, error: impl FnOnce(T) -> E) -> Result<(), E> {
        if self.labels.remove(label) {
            Ok(())
        } else {
            Err(error(label.clone()))
        }
    }

    /// Remove a label if present. Returns whether anything was removed.
    pub fn discard(&mut self, label: &T) -> bool {
        self.labels.remove(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.labels.iter()
    }

    pub fn as_set(&self) -> &HashSet<T> {
        &self.labels
    }
}

impl<T: Eq + Hash> FromIterator<T> for ValidatedLabelSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ValidatedLabelSet {
            labels: iter.into_iter().collect(),
        }
    }
}

impl<T: Eq + Hash> Extend<T> for ValidatedLabelSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.labels.extend(iter);
    }
}

impl<'a, T: Eq + Hash> IntoIterator for &'a ValidatedLabelSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}

/// List of possible errors raised by the automaton engines
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomatonError<Sy, St> {
    /// The symbol is not in the input alphabet or the stack alphabet it was checked against
    InvalidSymbol(Sy),
    /// The state is not in the state set
    InvalidState(St),
    /// A membership test was requested before an initial state was configured
    MissingInitialState,
    /// No branch accepted and at least one branch was cut off at the configured depth limit
    SearchDepthExceeded(usize),
}

impl<Sy: fmt::Debug, St: fmt::Debug> fmt::Display for AutomatonError<Sy, St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutomatonError::InvalidSymbol(symbol) => write!(f, "Error: Invalid symbol {:?}", symbol),
            AutomatonError::InvalidState(state) => write!(f, "Error: Invalid state {:?}", state),
            AutomatonError::MissingInitialState => {
                write!(f, "Error: The automaton has no initial state!")
            }
            AutomatonError::SearchDepthExceeded(limit) => write!(
                f,
                "Error: Search gave up after reaching the depth limit of {} transitions",
                limit
            ),
        }
    }
}

impl<Sy: fmt::Debug, St: fmt::Debug> std::error::Error for AutomatonError<Sy, St> {}

/// Tunables for the membership search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchConfig {
    /// Longest chain of transitions a single branch may follow. `None` searches without a bound,
    /// so a cycle of transitions that consume no input never returns.
    pub max_depth: Option<usize>,
}

impl SearchConfig {
    pub fn unbounded() -> Self {
        SearchConfig { max_depth: None }
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        SearchConfig {
            max_depth: Some(max_depth),
        }
    }
}

/// Depth bookkeeping shared by one membership test
pub(crate) struct SearchBudget {
    limit: Option<usize>,
    exhausted: bool,
}

impl SearchBudget {
    pub(crate) fn new(config: &SearchConfig) -> Self {
        SearchBudget {
            limit: config.max_depth,
            exhausted: false,
        }
    }

    /// Whether a branch may visit `depth`. Remembers any refusal.
    pub(crate) fn allows(&mut self, depth: usize) -> bool {
        match self.limit {
            Some(limit) if depth > limit => {
                self.exhausted = true;
                false
            }
            _ => true,
        }
    }

    pub(crate) fn verdict<Sy, St>(&self, accepted: bool) -> Result<bool, AutomatonError<Sy, St>> {
        match (accepted, self.exhausted, self.limit) {
            (false, true, Some(limit)) => Err(AutomatonError::SearchDepthExceeded(limit)),
            _ => Ok(accepted),
        }
    }
}

/// What a transition reads (and, for pushdown automata, how it rewrites the stack)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeLabel<'a, Sy> {
    Epsilon,
    Symbol(&'a Sy),
    Stack {
        input: Option<&'a Sy>,
        pop: Option<&'a Sy>,
        push: &'a [Sy],
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge<'a, Sy, St> {
    pub from: &'a St,
    pub to: &'a St,
    pub label: EdgeLabel<'a, Sy>,
}

/// Read-only view over an automaton shared by both engines
pub trait FA {
    type Symbol: Eq + Hash + Clone;
    type State: Eq + Hash + Clone;

    fn get_alphabet(&self) -> &Alphabet<Self::Symbol>;
    fn get_states(&self) -> &StateSet<Self::State>;
    fn get_start_state(&self) -> Option<&Self::State>;
    fn get_acceptor_states(&self) -> &StateSet<Self::State>;
    /// Every stored transition, duplicates included
    fn get_edges(&self) -> Vec<Edge<'_, Self::Symbol, Self::State>>;
}
