//! Nondeterministic pushdown automaton accepting by final state.
//!
//! A transition is keyed by the current state, an optional input symbol and an optional required
//! stack top. A missing input symbol reads nothing. A missing stack top is a wildcard: it fires
//! whatever the stack holds, the empty stack included, and pops nothing.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use tracing::{debug, trace};

use crate::fa::{
    Alphabet, AutomatonError, Edge, EdgeLabel, SearchBudget, SearchConfig, StateSet, FA,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PdaTransition<Sy, St> {
    pub origin: St,
    /// Input symbol consumed, `None` for an epsilon move
    pub input: Option<Sy>,
    /// Symbol that must be on top of the stack and is popped, `None` for any stack
    pub stack_top: Option<Sy>,
    pub destination: St,
    /// Symbols pushed after the pop. The first one ends up on top.
    pub push: Vec<Sy>,
}

impl<Sy, St> PdaTransition<Sy, St> {
    pub fn new(
        origin: St,
        input: Option<Sy>,
        stack_top: Option<Sy>,
        destination: St,
        push: Vec<Sy>,
    ) -> Self {
        PdaTransition {
            origin,
            input,
            stack_top,
            destination,
            push,
        }
    }
}

/// Outcome of a membership test. `stack` lists the accepting branch's final stack from bottom to
/// top; it is empty when the input is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdaRun<Sy> {
    pub accepted: bool,
    pub stack: Vec<Sy>,
}

impl<Sy> PdaRun<Sy> {
    pub fn top(&self) -> Option<&Sy> {
        self.stack.last()
    }
}

type Condition<Sy> = (Option<Sy>, Option<Sy>); // (input, stack top)
type Output<Sy, St> = (St, Vec<Sy>); // (destination, push)

#[derive(Debug, Clone)]
pub struct PushdownAutomaton<Sy: Eq + Hash, St: Eq + Hash> {
    alphabet: Alphabet<Sy>,
    stack_alphabet: Alphabet<Sy>,
    states: StateSet<St>,
    transitions: HashMap<St, HashMap<Condition<Sy>, Vec<Output<Sy, St>>>>,
    initial_state: Option<St>,
    accepting_states: StateSet<St>,
    search: SearchConfig,
}

impl<Sy: Eq + Hash, St: Eq + Hash> Default for PushdownAutomaton<Sy, St> {
    fn default() -> Self {
        PushdownAutomaton {
            alphabet: Alphabet::default(),
            stack_alphabet: Alphabet::default(),
            states: StateSet::default(),
            transitions: HashMap::new(),
            initial_state: None,
            accepting_states: StateSet::default(),
            search: SearchConfig::default(),
        }
    }
}

impl<Sy, St> PushdownAutomaton<Sy, St>
where
    Sy: Eq + Hash + Clone + Debug,
    St: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alphabets_and_states(
        alphabet: impl IntoIterator<Item = Sy>,
        stack_alphabet: impl IntoIterator<Item = Sy>,
        states: impl IntoIterator<Item = St>,
    ) -> Self {
        let mut pda = Self::new();
        pda.insert_symbols(alphabet);
        pda.insert_stack_symbols(stack_alphabet);
        pda.insert_states(states);
        pda
    }

    /// Build a complete automaton, validating every piece
    pub fn from_parts(
        alphabet: impl IntoIterator<Item = Sy>,
        stack_alphabet: impl IntoIterator<Item = Sy>,
        states: impl IntoIterator<Item = St>,
        initial_state: Option<St>,
        transitions: impl IntoIterator<Item = PdaTransition<Sy, St>>,
        accepting_states: impl IntoIterator<Item = St>,
    ) -> Result<Self, AutomatonError<Sy, St>> {
        let mut pda = Self::with_alphabets_and_states(alphabet, stack_alphabet, states);

        if let Some(initial_state) = initial_state {
            pda.set_initial_state(initial_state)?;
        }
        for transition in transitions {
            pda.insert_transition(transition)?;
        }
        for state in accepting_states {
            pda.insert_accepting_state(state)?;
        }
        Ok(pda)
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

    pub fn remove_symbol(&mut self, symbol: &Sy) -> Result<(), AutomatonError<Sy, St>> {
        self.alphabet.remove(symbol, AutomatonError::InvalidSymbol)
    }

    pub fn stack_alphabet(&self) -> &Alphabet<Sy> {
        &self.stack_alphabet
    }

    pub fn insert_stack_symbol(&mut self, symbol: Sy) -> bool {
        self.stack_alphabet.insert(symbol)
    }

    pub fn insert_stack_symbols(&mut self, symbols: impl IntoIterator<Item = Sy>) {
        self.stack_alphabet.extend(symbols);
    }

    pub fn remove_stack_symbol(&mut self, symbol: &Sy) -> Result<(), AutomatonError<Sy, St>> {
        self.stack_alphabet
            .remove(symbol, AutomatonError::InvalidSymbol)
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

    /// Remove a state from the state set only; nothing that refers to it is touched
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
        transition: &PdaTransition<Sy, St>,
    ) -> Result<(), AutomatonError<Sy, St>> {
        self.states
            .require(&transition.origin, AutomatonError::InvalidState)?;
        if let Some(symbol) = &transition.input {
            self.alphabet
                .require(symbol, AutomatonError::InvalidSymbol)?;
        }
        if let Some(symbol) = &transition.stack_top {
            self.stack_alphabet
                .require(symbol, AutomatonError::InvalidSymbol)?;
        }
        self.states
            .require(&transition.destination, AutomatonError::InvalidState)?;
        for symbol in &transition.push {
            self.stack_alphabet
                .require(symbol, AutomatonError::InvalidSymbol)?;
        }
        Ok(())
    }

    pub fn insert_transition(
        &mut self,
        transition: PdaTransition<Sy, St>,
    ) -> Result<(), AutomatonError<Sy, St>> {
        if let Err(err) = self.validate_transition(&transition) {
            debug!(?transition, %err, "rejected transition");
            return Err(err);
        }

        let PdaTransition {
            origin,
            input,
            stack_top,
            destination,
            push,
        } = transition;

        self.transitions
            .entry(origin)
            .or_default()
            .entry((input, stack_top))
            .or_default()
            .push((destination, push));
        Ok(())
    }

    /// Remove one occurrence of a transition. Missing transitions are ignored.
    pub fn remove_transition(&mut self, transition: &PdaTransition<Sy, St>) {
        let condition = (transition.input.clone(), transition.stack_top.clone());

        let Some(by_condition) = self.transitions.get_mut(&transition.origin) else {
            return;
        };
        let Some(outputs) = by_condition.get_mut(&condition) else {
            return;
        };
        let Some(position) = outputs.iter().position(|(destination, push)| {
            *destination == transition.destination && *push == transition.push
        }) else {
            return;
        };

        outputs.remove(position);
        if outputs.is_empty() {
            by_condition.remove(&condition);
        }
        if by_condition.is_empty() {
            self.transitions.remove(&transition.origin);
        }
    }

    /// Iterate over every stored transition
    pub fn transitions(&self) -> impl Iterator<Item = PdaTransition<&Sy, &St>> + '_ {
        self.transitions.iter().flat_map(|(origin, by_condition)| {
            by_condition
                .iter()
                .flat_map(move |((input, stack_top), outputs)| {
                    outputs.iter().map(move |(destination, push)| PdaTransition {
                        origin,
                        input: input.as_ref(),
                        stack_top: stack_top.as_ref(),
                        destination,
                        push: push.iter().collect(),
                    })
                })
        })
    }

    pub fn transition_count(&self) -> usize {
        self.transitions
            .values()
            .flat_map(|by_condition| by_condition.values())
            .map(Vec::len)
            .sum()
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    pub fn set_search_config(&mut self, config: SearchConfig) {
        self.search = config;
    }

    /// Test whether some run from the initial state with an empty stack consumes exactly
    /// `input` and ends in an accepting state. Leftover stack contents do not matter.
    pub fn accept<I>(&self, input: I) -> Result<PdaRun<Sy>, AutomatonError<Sy, St>>
    where
        I: IntoIterator<Item = Sy>,
    {
        let initial_state = self
            .initial_state
            .as_ref()
            .ok_or(AutomatonError::MissingInitialState)?;
        let input: Vec<Sy> = input.into_iter().collect();

        let mut budget = SearchBudget::new(&self.search);
        let final_stack = self.search(initial_state, &input, Vec::new(), 0, &mut budget);
        debug!(?input, accepted = final_stack.is_some(), "finished backtracking search");

        let accepted = budget.verdict(final_stack.is_some())?;
        Ok(PdaRun {
            accepted,
            stack: final_stack.unwrap_or_default(),
        })
    }

    /// Conditions worth looking up for the current input symbol and stack top, most specific
    /// first: reading moves before epsilon moves, exact stack matches before wildcards.
    fn candidate_conditions(next: Option<&Sy>, top: Option<&Sy>) -> Vec<Condition<Sy>> {
        let mut conditions = Vec::with_capacity(4);
        if let Some(symbol) = next {
            if let Some(top) = top {
                conditions.push((Some(symbol.clone()), Some(top.clone())));
            }
            conditions.push((Some(symbol.clone()), None));
        }
        if let Some(top) = top {
            conditions.push((None, Some(top.clone())));
        }
        conditions.push((None, None));
        conditions
    }

    fn search(
        &self,
        state: &St,
        input: &[Sy],
        stack: Vec<Sy>,
        depth: usize,
        budget: &mut SearchBudget,
    ) -> Option<Vec<Sy>> {
        trace!(?state, remaining = input.len(), ?stack, depth, "visiting");
        if !budget.allows(depth) {
            return None;
        }
        if input.is_empty() && self.accepting_states.contains(state) {
            return Some(stack);
        }

        let by_condition = self.transitions.get(state)?;

        for condition in Self::candidate_conditions(input.first(), stack.last()) {
            let Some(outputs) = by_condition.get(&condition) else {
                continue;
            };
            let (reads, pops) = (condition.0.is_some(), condition.1.is_some());
            let rest = if reads { &input[1..] } else { input };

            for (destination, push) in outputs {
                // Each branch owns its stack so siblings never see each other's pushes
                let mut next_stack = stack.clone();
                if pops {
                    next_stack.pop();
                }
                next_stack.extend(push.iter().rev().cloned());

                if let Some(final_stack) = self.search(destination, rest, next_stack, depth + 1, budget) {
                    return Some(final_stack);
                }
            }
        }

        None
    }
}

impl<Sy, St> FA for PushdownAutomaton<Sy, St>
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
        let mut edges = Vec::new();
        for (from, by_condition) in &self.transitions {
            for ((input, stack_top), outputs) in by_condition {
                for (to, push) in outputs {
                    edges.push(Edge {
                        from,
                        to,
                        label: EdgeLabel::Stack {
                            input: input.as_ref(),
                            pop: stack_top.as_ref(),
                            push,
                        },
                    });
                }
            }
        }
        edges
    }
}
