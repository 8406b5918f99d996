//! Redundant store elimination.
//!
//! Removes `sstore`, `mstore` and the other store statements whose effect is
//! never observed: on every path the stored region is overwritten before it is
//! read, or execution ends in a way that discards it.  Stores are tracked as
//! candidates in the abstract environment of the structured walker.  A
//! candidate starts out undecided, and becomes used when something may read
//! it or unused when something certainly overwrites it.  Candidates still
//! undecided at the end of a function are used (the caller may read them).
//! At the end of the program, memory is discarded and storage persists.
//!
//! Only stores whose arguments are all variables or literals are candidates,
//! and region bounds are only understood when they are SSA variables.  Memory
//! stores are left alone entirely if the program contains `msize`, because
//! removing one may change the size of memory.

use std::collections::{BTreeMap as Map, BTreeSet as Set};

use log::{debug, trace};

use super::config::PassConfig;
use super::statement_remover::remove_statements;
use crate::commons::*;
use crate::middle_end::analysis::call_graph::contains_msize;
use crate::middle_end::analysis::knowledge_base::{Knowledge, KnowledgeBase};
use crate::middle_end::analysis::side_effects::FunctionSideEffects;
use crate::middle_end::analysis::ssa_values::ValueMap;
use crate::middle_end::analysis::*;
use crate::middle_end::dialect::Instruction;
use crate::middle_end::sir::*;

mod operations;
mod regions;

pub use operations::*;
pub use regions::*;

// SECTION: the pass

/// Remove redundant stores with the default configuration.
pub fn redundant_store_elim(valid_program: Valid<Program>) -> Valid<Program> {
    redundant_store_elim_with(valid_program, &PassConfig::default())
}

pub fn redundant_store_elim_with(valid_program: Valid<Program>, config: &PassConfig) -> Valid<Program> {
    let mut program = valid_program.0;

    let side_effects = FunctionSideEffects::compute(&program);
    let values = ValueMap::new(&program);
    let ignore_memory = contains_msize(&program);
    if ignore_memory {
        debug!("the program uses msize, memory stores are kept");
    }

    let removals =
        RedundantStoreEliminator::new(&side_effects, &values, ignore_memory).run(&program, config);
    debug!("removing {} redundant store(s)", removals.len());
    remove_statements(&mut program, &removals);

    // removing expression statements can't invalidate a program.
    program
        .validate()
        .expect("redundant store elimination produced an invalid program")
}

// SECTION: the tracker

/// The lifecycle of a candidate store.  The order is the join order: a store
/// used on some path is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    Unused,
    Undecided,
    Used,
}

/// The candidates reachable at a program point, with their states.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackedStores(pub Map<StmtId, State>);

impl AbstractEnv for TrackedStores {
    fn join_with(&mut self, rhs: Self) {
        for (id, state) in rhs.0 {
            self.0
                .entry(id)
                .and_modify(|s| *s = (*s).max(state))
                .or_insert(state);
        }
    }
}

/// The per-run state of the pass.  Created for one program and consumed by
/// [RedundantStoreEliminator::run].
pub struct RedundantStoreEliminator<'a, K: Knowledge = KnowledgeBase<'a>> {
    side_effects: &'a FunctionSideEffects,
    extractor: OperationExtractor<'a>,
    knowledge: K,
    ignore_memory: bool,
    stores: TrackedStores,
    store_operations: Map<StmtId, Operation>,
    // the operations of the enclosing function bodies, innermost last.
    outer_operations: Vec<Map<StmtId, Operation>>,
    pending_removals: Set<StmtId>,
}

impl<'a> RedundantStoreEliminator<'a> {
    pub fn new(
        side_effects: &'a FunctionSideEffects,
        values: &'a ValueMap,
        ignore_memory: bool,
    ) -> Self {
        Self::with_knowledge(side_effects, values, KnowledgeBase::new(values), ignore_memory)
    }
}

impl<'a, K: Knowledge> RedundantStoreEliminator<'a, K> {
    /// Like `new`, but region questions are answered by `knowledge`.
    pub fn with_knowledge(
        side_effects: &'a FunctionSideEffects,
        values: &'a ValueMap,
        knowledge: K,
        ignore_memory: bool,
    ) -> Self {
        RedundantStoreEliminator {
            side_effects,
            extractor: OperationExtractor::new(side_effects, values),
            knowledge,
            ignore_memory,
            stores: TrackedStores::default(),
            store_operations: Map::new(),
            outer_operations: Vec::new(),
            pending_removals: Set::new(),
        }
    }

    /// Analyze `program` and return the ids of the statements to remove.
    pub fn run(mut self, program: &Program, config: &PassConfig) -> Set<StmtId> {
        forward_walk(program, &mut self, config.max_loop_nesting);

        self.change_undecided_to(State::Unused, Some(Location::Memory));
        self.change_undecided_to(State::Used, Some(Location::Storage));
        self.schedule_unused_for_deletion();

        self.pending_removals
    }

    // decided candidates are never revisited.
    fn apply_operation(&mut self, op: &Operation) {
        for (id, state) in self.stores.0.iter_mut() {
            if *state != State::Undecided {
                continue;
            }
            let store = &self.store_operations[id];
            let new_state = match op.effect {
                Access::Read if !known_unrelated(&self.knowledge, store, op) => State::Used,
                Access::Write if known_covered(&self.knowledge, store, op) => State::Unused,
                _ => continue,
            };
            trace!("store at statement {id} is {new_state:?}");
            *state = new_state;
        }
    }

    fn change_undecided_to(&mut self, new_state: State, only: Option<Location>) {
        for (id, state) in self.stores.0.iter_mut() {
            if *state != State::Undecided {
                continue;
            }
            let location = match self.store_operations.get(id) {
                Some(op) => op.location,
                None => panic!("store at statement {id} has no recorded operation"),
            };
            if only.map_or(true, |only| only == location) {
                *state = new_state;
            }
        }
    }

    fn schedule_unused_for_deletion(&mut self) {
        self.pending_removals.extend(
            self.stores
                .0
                .iter()
                .filter(|(_, state)| **state == State::Unused)
                .map(|(id, _)| *id),
        );
    }

    // the instruction called by a statement that may become a candidate.
    fn candidate_store<'s>(&self, stmt: &'s Statement) -> Option<(Instruction, &'s FunctionCall)> {
        let Statement::Expression(Expression::Call(call)) = stmt else {
            return None;
        };
        let inst = Instruction::from_name(call.function_name.as_str())?;
        let tracked = inst == Instruction::SStore || (!self.ignore_memory && inst.is_store());
        if tracked && call.arguments.iter().all(Expression::is_simple) {
            Some((inst, call))
        } else {
            None
        }
    }
}

impl<'a, K: Knowledge> StructuredAnalysis for RedundantStoreEliminator<'a, K> {
    type Env = TrackedStores;

    fn env(&mut self) -> &mut TrackedStores {
        &mut self.stores
    }

    fn visit_call(&mut self, call: &FunctionCall) {
        for op in self.extractor.operations(call) {
            self.apply_operation(&op);
        }

        let summary = self.side_effects.get(&call.function_name);
        if summary.terminates {
            self.change_undecided_to(State::Unused, Some(Location::Memory));
            let storage = if summary.reverts {
                State::Unused
            } else {
                State::Used
            };
            self.change_undecided_to(storage, Some(Location::Storage));
        }
    }

    fn visit_statement(&mut self, id: StmtId, stmt: &Statement) {
        let Some((inst, call)) = self.candidate_store(stmt) else {
            return;
        };

        let mut ops = self.extractor.operations(call);
        assert_eq!(ops.len(), 1, "{inst:?} must be a single operation");
        let op = ops.remove(0);

        if !self.stores.0.contains_key(&id) {
            debug!("tracking store at statement {id}: {stmt}");
        }
        self.stores.0.entry(id).or_insert(State::Undecided);
        self.store_operations.insert(id, op);
    }

    fn visit_leave(&mut self) {
        self.change_undecided_to(State::Used, None);
    }

    fn enter_function(&mut self, def: &FunctionDefinition) {
        trace!("entering function {}", def.name);
        let outer = std::mem::take(&mut self.store_operations);
        self.outer_operations.push(outer);
    }

    fn leave_function(&mut self, def: &FunctionDefinition) {
        trace!("leaving function {}", def.name);
        self.change_undecided_to(State::Used, None);
        self.schedule_unused_for_deletion();
        self.store_operations = self.outer_operations.pop().unwrap_or_default();
    }

    fn shortcut_nested_loop(&mut self, _zero_runs: &TrackedStores) {
        self.change_undecided_to(State::Used, None);
    }
}
