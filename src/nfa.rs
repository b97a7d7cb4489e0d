//! Nondeterministic finite-state automaton with epsilon transitions.
//!
//! Membership is decided by a depth first backtracking search over the transition relation.
//! `accept_by_frontier` answers the same question by tracking the set of reachable states.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use tracing::{debug, trace};

use crate::fa::{
    Alphabet, AutomatonError, Edge, EdgeLabel, SearchBudget, SearchConfig, StateSet, FA,
};

/// A single transition. `symbol == None` is an epsilon transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsaTransition<Sy, St> {
    pub origin: St,
    pub symbol: Option<Sy>,
    pub destination: St,
}

impl<Sy, St> FsaTransition<Sy, St> {
    pub fn new(origin: St, symbol: Sy, destination: St) -> Self {
        FsaTransition {
            origin,
            symbol: Some(symbol),
            destination,
        }
    }

    pub fn epsilon(origin: St, destination: St) -> Self {
        FsaTransition {
            origin,
            symbol: None,
            destination,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FiniteStateAutomaton<Sy: Eq + Hash, St: Eq + Hash> {
    alphabet: Alphabet<Sy>,
    states: StateSet<St>,
    initial_state: Option<St>,
    transitions: HashMap<St, HashMap<Option<Sy>, Vec<St>>>, // origin -> symbol -> destinations
    accepting_states: StateSet<St>,
    search: SearchConfig,
}

impl<Sy: Eq + Hash, St: Eq + Hash> Default for FiniteStateAutomaton<Sy, St> {
    fn default() -> Self {
        FiniteStateAutomaton {
            alphabet: Alphabet::default(),
            states: StateSet::default(),
            initial_state: None,
            transitions: HashMap::new(),
            accepting_states: StateSet::default(),
            search: SearchConfig::default(),
        }
    }
}

impl<Sy, St> FiniteStateAutomaton<Sy, St>
where
    Sy: Eq + Hash + Clone + Debug,
    St: Eq + Hash + Clone + Debug,
{
    /// Create an automaton with no symbols, states, transitions or initial state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alphabet_and_states(
        alphabet: impl IntoIterator<Item = Sy>,
        states: impl IntoIterator<Item = St>,
    ) -> Self {
        let mut fsa = Self::new();
        fsa.insert_symbols(alphabet);
        fsa.insert_states(states);
        fsa
    }

    /// Build a complete automaton, validating every piece. Nothing is returned unless the whole
    /// configuration is valid.
    pub fn from_parts(
        alphabet: impl IntoIterator<Item = Sy>,
        states: impl IntoIterator<Item = St>,
        initial_state: Option<St>,
        transitions: impl IntoIterator<Item = FsaTransition<Sy, St>>,
        accepting_states: impl IntoIterator<Item = St>,
    ) -> Result<Self, AutomatonError<Sy, St>> {
        let mut fsa = Self::with_alphabet_and_states(alphabet, states);

        if let Some(initial_state) = initial_state {
            fsa.set_initial_state(initial_state)?;
        }
        for transition in transitions {
            fsa.insert_transition(transition)?;
        }
        for state in accepting_states {
            fsa.insert_accepting_state(state)?;
        }
        Ok(fsa)
    }

    pub fn alphabet(&self) -> &Alphabet<Sy> {
        &self.alphabet
    }

    pub fn insert_symbol(&mut self, symbol: Sy) -> bool {
        self.alphabet.insert(symbol)
    }

    pub fn insert_symbols(&mut self, symbols: impl IntoIterator<Item = Sy>) {
        self.alphabet.extend(symbols);
    }

    /// Remove a symbol from the alphabet. Transitions reading it are kept.
    pub fn remove_symbol(&mut self, symbol: &Sy) -> Result<(), AutomatonError<Sy, St>> {
        self.alphabet.remove(symbol, AutomatonError::InvalidSymbol)
    }

    pub fn states(&self) -> &StateSet<St> {
        &self.states
    }

    pub fn insert_state(&mut self, state: St) -> bool {
        self.states.insert(state)
    }

    pub fn insert_states(&mut self, states: impl IntoIterator<Item = St>) {
        self.states.extend(states);
    }

    /// Remove a state from the state set only. Transitions, the initial state and the accepting
    /// set may keep referring to it.
    pub fn remove_state(&mut self, state: &St) -> Result<(), AutomatonError<Sy, St>> {
        self.states.remove(state, AutomatonError::InvalidState)
    }

    pub fn initial_state(&self) -> Option<&St> {
        self.initial_state.as_ref()
    }

    pub fn set_initial_state(&mut self, state: St) -> Result<(), AutomatonError<Sy, St>> {
        self.states.require(&state, AutomatonError::InvalidState)?;
        self.initial_state = Some(state);
        Ok(())
    }

    pub fn accepting_states(&self) -> &StateSet<St> {
        &self.accepting_states
    }

    pub fn insert_accepting_state(&mut self, state: St) -> Result<(), AutomatonError<Sy, St>> {
        self.states.require(&state, AutomatonError::InvalidState)?;
        self.accepting_states.insert(state);
        Ok(())
    }

    pub fn remove_accepting_state(&mut self, state: &St) -> Result<(), AutomatonError<Sy, St>> {
        self.states.require(state, AutomatonError::InvalidState)?;
        self.accepting_states.discard(state);
        Ok(())
    }

    fn validate_transition(
        &self,
        transition: &FsaTransition<Sy, St>,
    ) -> Result<(), AutomatonError<Sy, St>> {
        self.states
            .require(&transition.origin, AutomatonError::InvalidState)?;
        if let Some(symbol) = &transition.symbol {
            self.alphabet
                .require(symbol, AutomatonError::InvalidSymbol)?;
        }
        self.states
            .require(&transition.destination, AutomatonError::InvalidState)
    }

    /// Add a transition. Identical transitions accumulate rather than being merged.
    pub fn insert_transition(
        &mut self,
        transition: FsaTransition<Sy, St>,
    ) -> Result<(), AutomatonError<Sy, St>> {
        if let Err(err) = self.validate_transition(&transition) {
            debug!(?transition, %err, "rejected transition");
            return Err(err);
        }

        let FsaTransition {
            origin,
            symbol,
            destination,
        } = transition;

        self.transitions
            .entry(origin)
            .or_default()
            .entry(symbol)
            .or_default()
            .push(destination);
        Ok(())
    }

    /// Remove one occurrence of a transition. Missing transitions are ignored.
    pub fn remove_transition(&mut self, transition: &FsaTransition<Sy, St>) {
        let Some(by_symbol) = self.transitions.get_mut(&transition.origin) else {
            return;
        };
        let Some(destinations) = by_symbol.get_mut(&transition.symbol) else {
            return;
        };
        let Some(position) = destinations
            .iter()
            .position(|destination| *destination == transition.destination)
        else {
            return;
        };

        destinations.remove(position);
        if destinations.is_empty() {
            by_symbol.remove(&transition.symbol);
        }
        if by_symbol.is_empty() {
            self.transitions.remove(&transition.origin);
        }
    }

    /// Iterate over every stored transition as `(origin, symbol, destination)`
    pub fn transitions(&self) -> impl Iterator<Item = (&St, Option<&Sy>, &St)> + '_ {
        self.transitions.iter().flat_map(|(origin, by_symbol)| {
            by_symbol.iter().flat_map(move |(symbol, destinations)| {
                destinations
                    .iter()
                    .map(move |destination| (origin, symbol.as_ref(), destination))
            })
        })
    }

    pub fn transition_count(&self) -> usize {
        self.transitions
            .values()
            .flat_map(|by_symbol| by_symbol.values())
            .map(Vec::len)
            .sum()
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    pub fn set_search_config(&mut self, config: SearchConfig) {
        self.search = config;
    }

    fn destinations(&self, state: &St, symbol: Option<&Sy>) -> &[St] {
        self.transitions
            .get(state)
            .and_then(|by_symbol| by_symbol.get(&symbol.cloned()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Test whether some path from the initial state consumes exactly `input` and ends in an
    /// accepting state
    pub fn accept<I>(&self, input: I) -> Result<bool, AutomatonError<Sy, St>>
    where
        I: IntoIterator<Item = Sy>,
    {
        let initial_state = self
            .initial_state
            .as_ref()
            .ok_or(AutomatonError::MissingInitialState)?;
        let input: Vec<Sy> = input.into_iter().collect();

        let mut budget = SearchBudget::new(&self.search);
        let accepted = self.search(initial_state, &input, 0, &mut budget);
        debug!(?input, accepted, "finished backtracking search");
        budget.verdict(accepted)
    }

    fn search(&self, state: &St, input: &[Sy], depth: usize, budget: &mut SearchBudget) -> bool {
        trace!(?state, remaining = input.len(), depth, "visiting");
        if !budget.allows(depth) {
            return false;
        }

        match input.split_first() {
            Some((symbol, rest)) => {
                for destination in self.destinations(state, Some(symbol)) {
                    if self.search(destination, rest, depth + 1, budget) {
                        return true;
                    }
                }
            }
            None => {
                if self.accepting_states.contains(state) {
                    return true;
                }
            }
        }

        // Epsilon moves keep the input where it is
        for destination in self.destinations(state, None) {
            if self.search(destination, input, depth + 1, budget) {
                return true;
            }
        }

        false
    }

    /// Same question as `accept`, answered by simulating all branches at once. Terminates even
    /// when the machine has epsilon cycles.
    pub fn accept_by_frontier<I>(&self, input: I) -> Result<bool, AutomatonError<Sy, St>>
    where
        I: IntoIterator<Item = Sy>,
    {
        let initial_state = self
            .initial_state
            .as_ref()
            .ok_or(AutomatonError::MissingInitialState)?;

        let mut frontier = self.epsilon_closure(HashSet::from([initial_state]));

        for symbol in input {
            let reached: HashSet<&St> = frontier
                .iter()
                .flat_map(|state| self.destinations(state, Some(&symbol)))
                .collect();
            frontier = self.epsilon_closure(reached);
            trace!(?symbol, frontier = frontier.len(), "advanced frontier");

            if frontier.is_empty() {
                return Ok(false);
            }
        }

        Ok(frontier
            .iter()
            .any(|state| self.accepting_states.contains(state)))
    }

    /// All states reachable from `states` through epsilon transitions alone
    fn epsilon_closure<'a>(&'a self, states: HashSet<&'a St>) -> HashSet<&'a St> {
        let mut closure = HashSet::with_capacity(states.len());
        let mut stack: Vec<&St> = states.into_iter().collect();

        while let Some(state) = stack.pop() {
            if !closure.insert(state) {
                continue;
            }
            for destination in self.destinations(state, None) {
                if !closure.contains(destination) {
                    stack.push(destination);
                }
            }
        }

        closure
    }
}

impl<Sy, St> FA for FiniteStateAutomaton<Sy, St>
where
    Sy: Eq + Hash + Clone + Debug,
    St: Eq + Hash + Clone + Debug,
{
    type Symbol = Sy;
    type State = St;

    fn get_alphabet(&self) -> &Alphabet<Sy> {
        &self.alphabet
    }

    fn get_states(&self) -> &StateSet<St> {
        &self.states
    }

    fn get_start_state(&self) -> Option<&St> {
        self.initial_state.as_ref()
    }

    fn get_acceptor_states(&self) -> &StateSet<St> {
        &self.accepting_states
    }

    fn get_edges(&self) -> Vec<Edge<'_, Sy, St>> {
        self.transitions()
            .map(|(from, symbol, to)| Edge {
                from,
                to,
                label: match symbol {
                    Some(symbol) => EdgeLabel::Symbol(symbol),
                    None => EdgeLabel::Epsilon,
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod nfa_tests {
    use super::*;

    type Fsa = FiniteStateAutomaton<char, &'static str>;

    fn chars(word: &str) -> Vec<char> {
        word.chars().collect()
    }

    // (a|b)*b
    fn ends_in_b() -> Fsa {
        let mut fsa = Fsa::new();
        fsa.insert_symbols(['a', 'b']);
        fsa.insert_states(["q0", "q1", "q2"]);
        fsa.set_initial_state("q0").unwrap();
        fsa.insert_transition(FsaTransition::new("q0", 'a', "q1"))
            .unwrap();
        fsa.insert_transition(FsaTransition::new("q0", 'b', "q2"))
            .unwrap();
        fsa.insert_transition(FsaTransition::new("q1", 'a', "q1"))
            .unwrap();
        fsa.insert_transition(FsaTransition::new("q1", 'b', "q2"))
            .unwrap();
        fsa.insert_transition(FsaTransition::new("q2", 'a', "q1"))
            .unwrap();
        fsa.insert_transition(FsaTransition::new("q2", 'b', "q2"))
            .unwrap();
        fsa.insert_accepting_state("q2").unwrap();
        fsa
    }

    #[test]
    fn test_fsa_is_created_empty() {
        let fsa = Fsa::new();
        assert!(fsa.alphabet().is_empty());
        assert!(fsa.states().is_empty());
        assert_eq!(fsa.transition_count(), 0);
        assert!(fsa.accepting_states().is_empty());
        assert_eq!(fsa.initial_state(), None);
    }

    #[test]
    fn test_duplicate_symbols_and_states() {
        let mut fsa = Fsa::new();
        assert!(fsa.insert_symbol('a'));
        assert!(!fsa.insert_symbol('a'));
        fsa.insert_symbols(['a', 'b']);
        assert_eq!(fsa.alphabet().len(), 2);

        fsa.insert_state("q0");
        fsa.insert_state("q0");
        fsa.insert_states(["q0", "q1", "q2"]);
        assert_eq!(fsa.states().len(), 3);
    }

    #[test]
    fn test_remove_symbol() {
        let mut fsa = Fsa::new();
        fsa.insert_symbols(['a', 'b']);

        assert!(fsa.remove_symbol(&'a').is_ok());
        assert!(fsa.alphabet().contains(&'b'));
        assert_eq!(fsa.alphabet().len(), 1);

        assert_eq!(
            fsa.remove_symbol(&'a'),
            Err(AutomatonError::InvalidSymbol('a'))
        );
        assert_eq!(fsa.alphabet().len(), 1);
    }

    #[test]
    fn test_remove_state() {
        let mut fsa = Fsa::new();
        fsa.insert_states(["q0", "q1"]);

        assert!(fsa.remove_state(&"q0").is_ok());
        assert_eq!(fsa.states().len(), 1);
        assert!(fsa.states().contains(&"q1"));

        assert_eq!(
            fsa.remove_state(&"q0"),
            Err(AutomatonError::InvalidState("q0"))
        );
    }

    #[test]
    fn test_set_initial_state() {
        let mut fsa = Fsa::new();
        assert_eq!(
            fsa.set_initial_state("q0"),
            Err(AutomatonError::InvalidState("q0"))
        );
        assert_eq!(fsa.initial_state(), None);

        fsa.insert_state("q0");
        assert!(fsa.set_initial_state("q0").is_ok());
        assert_eq!(fsa.initial_state(), Some(&"q0"));
    }

    #[test]
    fn test_insert_transition() {
        let mut fsa = Fsa::with_alphabet_and_states(['a'], ["q0", "q1"]);

        assert!(fsa
            .insert_transition(FsaTransition::new("q0", 'a', "q1"))
            .is_ok());
        assert!(fsa
            .insert_transition(FsaTransition::epsilon("q1", "q0"))
            .is_ok());
        assert_eq!(fsa.transition_count(), 2);

        let mut stored: Vec<(&str, Option<char>, &str)> = fsa
            .transitions()
            .map(|(from, symbol, to)| (*from, symbol.copied(), *to))
            .collect();
        stored.sort();
        assert_eq!(stored, vec![("q0", Some('a'), "q1"), ("q1", None, "q0")]);
    }

    #[test]
    fn test_duplicate_transitions_accumulate() {
        let mut fsa = Fsa::with_alphabet_and_states(['a'], ["q0", "q1"]);
        fsa.insert_transition(FsaTransition::new("q0", 'a', "q1"))
            .unwrap();
        fsa.insert_transition(FsaTransition::new("q0", 'a', "q1"))
            .unwrap();
        assert_eq!(fsa.transition_count(), 2);

        fsa.remove_transition(&FsaTransition::new("q0", 'a', "q1"));
        assert_eq!(fsa.transition_count(), 1);
    }

    #[test]
    fn test_insert_invalid_transition() {
        let mut fsa = Fsa::new();

        // machine is empty
        assert_eq!(
            fsa.insert_transition(FsaTransition::new("q0", 'a', "q1")),
            Err(AutomatonError::InvalidState("q0"))
        );
        assert_eq!(fsa.transition_count(), 0);

        // q0 exists but 'a' does not
        fsa.insert_state("q0");
        assert_eq!(
            fsa.insert_transition(FsaTransition::new("q0", 'a', "q1")),
            Err(AutomatonError::InvalidSymbol('a'))
        );
        assert_eq!(fsa.transition_count(), 0);

        // q0 and 'a' exist but q1 does not
        fsa.insert_symbol('a');
        assert_eq!(
            fsa.insert_transition(FsaTransition::new("q0", 'a', "q1")),
            Err(AutomatonError::InvalidState("q1"))
        );
        assert_eq!(
            fsa.insert_transition(FsaTransition::epsilon("q0", "q1")),
            Err(AutomatonError::InvalidState("q1"))
        );
        assert_eq!(fsa.transition_count(), 0);
    }

    #[test]
    fn test_remove_missing_transition_is_silent() {
        let mut fsa = ends_in_b();
        let before = fsa.transition_count();

        fsa.remove_transition(&FsaTransition::new("q0", 'b', "q1"));
        fsa.remove_transition(&FsaTransition::epsilon("q0", "q2"));
        fsa.remove_transition(&FsaTransition::new("q7", 'z', "q8"));
        assert_eq!(fsa.transition_count(), before);

        fsa.remove_transition(&FsaTransition::new("q0", 'b', "q2"));
        assert_eq!(fsa.transition_count(), before - 1);
        assert_eq!(fsa.accept(chars("b")), Ok(false));
    }

    #[test]
    fn test_accepting_states() {
        let mut fsa = Fsa::new();
        assert_eq!(
            fsa.insert_accepting_state("q0"),
            Err(AutomatonError::InvalidState("q0"))
        );
        assert!(fsa.accepting_states().is_empty());

        fsa.insert_state("q0");
        assert!(fsa.insert_accepting_state("q0").is_ok());
        assert!(fsa.accepting_states().contains(&"q0"));

        assert_eq!(
            fsa.remove_accepting_state(&"q1"),
            Err(AutomatonError::InvalidState("q1"))
        );
        assert!(fsa.remove_accepting_state(&"q0").is_ok());
        assert!(fsa.accepting_states().is_empty());
    }

    #[test]
    fn test_accept_and_reject() {
        let fsa = ends_in_b();
        assert_eq!(fsa.accept(chars("aab")), Ok(true));
        assert_eq!(fsa.accept(chars("baa")), Ok(false));
        assert_eq!(fsa.accept(chars("")), Ok(false));
        assert_eq!(fsa.accept(chars("b")), Ok(true));
    }

    #[test]
    fn test_accept_without_initial_state() {
        let mut fsa = Fsa::with_alphabet_and_states(['a'], ["q0"]);
        fsa.insert_accepting_state("q0").unwrap();

        assert_eq!(
            fsa.accept(chars("")),
            Err(AutomatonError::MissingInitialState)
        );
        assert_eq!(
            fsa.accept_by_frontier(chars("a")),
            Err(AutomatonError::MissingInitialState)
        );
    }

    #[test]
    fn test_removed_state_keeps_transitions() {
        let mut fsa = ends_in_b();
        let before = fsa.transition_count();

        fsa.remove_state(&"q1").unwrap();
        assert_eq!(fsa.transition_count(), before);
        assert_eq!(fsa.accept(chars("ab")), Ok(true));

        fsa.remove_symbol(&'a').unwrap();
        assert_eq!(fsa.accept(chars("ab")), Ok(true));
    }

    #[test]
    fn test_nondeterministic_choice() {
        // Strings whose second to last symbol is 'a'
        let mut fsa = Fsa::with_alphabet_and_states(['a', 'b'], ["s", "m", "f"]);
        fsa.set_initial_state("s").unwrap();
        fsa.insert_transition(FsaTransition::new("s", 'a', "s"))
            .unwrap();
        fsa.insert_transition(FsaTransition::new("s", 'b', "s"))
            .unwrap();
        fsa.insert_transition(FsaTransition::new("s", 'a', "m"))
            .unwrap();
        fsa.insert_transition(FsaTransition::new("m", 'a', "f"))
            .unwrap();
        fsa.insert_transition(FsaTransition::new("m", 'b', "f"))
            .unwrap();
        fsa.insert_accepting_state("f").unwrap();

        for (word, expected) in [("ab", true), ("bbab", true), ("aa", true), ("ba", false), ("b", false)] {
            assert_eq!(fsa.accept(chars(word)), Ok(expected), "word {word}");
            assert_eq!(fsa.accept_by_frontier(chars(word)), Ok(expected), "word {word}");
        }
    }

    #[test]
    fn test_epsilon_transitions() {
        // a*b* built from two halves joined by an epsilon move
        let mut fsa = Fsa::with_alphabet_and_states(['a', 'b'], ["as", "bs"]);
        fsa.set_initial_state("as").unwrap();
        fsa.insert_transition(FsaTransition::new("as", 'a', "as"))
            .unwrap();
        fsa.insert_transition(FsaTransition::epsilon("as", "bs"))
            .unwrap();
        fsa.insert_transition(FsaTransition::new("bs", 'b', "bs"))
            .unwrap();
        fsa.insert_accepting_state("bs").unwrap();

        for (word, expected) in [("", true), ("aab", true), ("bb", true), ("aa", true), ("aba", false)] {
            assert_eq!(fsa.accept(chars(word)), Ok(expected), "word {word}");
            assert_eq!(fsa.accept_by_frontier(chars(word)), Ok(expected), "word {word}");
        }
    }

    #[test]
    fn test_epsilon_cycle_hits_depth_limit() {
        let mut fsa = Fsa::with_alphabet_and_states(['a'], ["q0", "q1", "q2"]);
        fsa.set_initial_state("q0").unwrap();
        fsa.insert_transition(FsaTransition::epsilon("q0", "q1"))
            .unwrap();
        fsa.insert_transition(FsaTransition::epsilon("q1", "q0"))
            .unwrap();
        fsa.insert_accepting_state("q2").unwrap();
        fsa.set_search_config(SearchConfig::with_max_depth(50));

        assert_eq!(
            fsa.accept(chars("")),
            Err(AutomatonError::SearchDepthExceeded(50))
        );
        assert_eq!(fsa.accept_by_frontier(chars("")), Ok(false));

        // once a path to acceptance exists the cycle no longer matters
        fsa.insert_transition(FsaTransition::new("q0", 'a', "q2"))
            .unwrap();
        assert_eq!(fsa.accept(chars("a")), Ok(true));
        assert_eq!(fsa.accept_by_frontier(chars("a")), Ok(true));
    }

    #[test]
    fn test_from_parts() {
        let fsa = Fsa::from_parts(
            ['a'],
            ["q0", "q1"],
            Some("q0"),
            [FsaTransition::new("q0", 'a', "q1")],
            ["q1"],
        )
        .unwrap();
        assert_eq!(fsa.accept(chars("a")), Ok(true));

        let err = Fsa::from_parts(
            ['a'],
            ["q0"],
            Some("q0"),
            [FsaTransition::new("q0", 'b', "q0")],
            ["q0"],
        )
        .unwrap_err();
        assert_eq!(err, AutomatonError::InvalidSymbol('b'));
    }

    #[test]
    fn test_accept_is_repeatable_across_mutations() {
        let mut fsa = ends_in_b();
        assert_eq!(fsa.accept(chars("ba")), Ok(false));
        assert_eq!(fsa.accept(chars("ba")), Ok(false));

        fsa.insert_accepting_state("q1").unwrap();
        assert_eq!(fsa.accept(chars("ba")), Ok(true));
    }
}
