//! Side-effect summaries of user-defined functions.
//!
//! A function reads (writes) memory or storage if anything it may end up
//! calling does.  Whether it terminates is harder: it terminates when its body
//! is guaranteed to reach a call that never returns, and proving that is done
//! conservatively on the straight-line prefix of the body.

use std::collections::{BTreeMap as Map, BTreeSet as Set};

use serde::{Deserialize, Serialize};

use super::call_graph::CallGraph;
use crate::middle_end::dialect::{Effect, Instruction, SideEffects};
use crate::middle_end::sir::*;

/// Side effects of every user-defined function of a program.  Builtins are
/// answered from the dialect and anything else (external functions) gets the
/// worst case.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionSideEffects {
    effects: Map<Name, SideEffects>,
}

impl FunctionSideEffects {
    pub fn compute(program: &Program) -> Self {
        let graph = CallGraph::new(program);

        let mut effects: Map<Name, SideEffects> = graph
            .callees
            .keys()
            .map(|f| (f.clone(), accessed_locations(&graph, f)))
            .collect();

        let terminating = terminating_functions(program, &graph);
        for (f, summary) in effects.iter_mut() {
            summary.terminates = terminating.contains(f);
            summary.reverts = summary.terminates && !may_stop(&graph, f);
        }

        log::trace!("function side effects: {effects:?}");
        FunctionSideEffects { effects }
    }

    /// Read a precomputed table, a JSON object from function names to
    /// summaries.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn get(&self, callable: &Name) -> SideEffects {
        match Instruction::from_name(callable.as_str()) {
            Some(inst) => inst.side_effects(),
            None => self
                .effects
                .get(callable)
                .copied()
                .unwrap_or_else(SideEffects::worst),
        }
    }
}

impl FromIterator<(Name, SideEffects)> for FunctionSideEffects {
    fn from_iter<I: IntoIterator<Item = (Name, SideEffects)>>(iter: I) -> Self {
        FunctionSideEffects {
            effects: iter.into_iter().collect(),
        }
    }
}

// SECTION: memory and storage

fn accessed_locations(graph: &CallGraph, f: &Name) -> SideEffects {
    let mut summary = SideEffects::default();

    for g in graph.reachable(f) {
        let (memory, storage) = match Instruction::from_name(g.as_str()) {
            Some(inst) => {
                let e = inst.side_effects();
                (e.memory, e.storage)
            }
            // the callees of defined functions are reachable themselves.
            None if graph.callees.contains_key(&g) => (Effect::None, Effect::None),
            None => (Effect::Write, Effect::Write),
        };
        summary.memory = summary.memory.max(memory);
        summary.storage = summary.storage.max(storage);
    }

    summary
}

// whether calling `f` may end execution without reverting.  external
// functions might.
fn may_stop(graph: &CallGraph, f: &Name) -> bool {
    graph
        .reachable(f)
        .iter()
        .any(|g| match Instruction::from_name(g.as_str()) {
            Some(inst) => inst.stops_successfully(),
            None => !graph.callees.contains_key(g),
        })
}

// SECTION: termination

// least fixpoint: a function terminates once its body is proved not to return,
// using the functions proved so far.
fn terminating_functions(program: &Program, graph: &CallGraph) -> Set<Name> {
    let defs = program.function_definitions();
    let mut terminating = Set::new();

    loop {
        let mut changed = false;
        for def in &defs {
            if terminating.contains(&def.name) {
                continue;
            }
            let never_returns = |call: &FunctionCall| {
                match Instruction::from_name(call.function_name.as_str()) {
                    Some(inst) => inst.terminates(),
                    None => {
                        graph.callees.contains_key(&call.function_name)
                            && terminating.contains(&call.function_name)
                    }
                }
            };
            if !block_may_complete(&def.body, &never_returns) {
                changed = true;
                terminating.insert(def.name.clone());
            }
        }
        if !changed {
            return terminating;
        }
    }
}

// false when the block certainly reaches a call that never returns, before
// anything that could `leave`.  walks top-level statements in order and stops
// at the first one with nested control flow it can't see through.
fn block_may_complete(block: &Block, never_returns: &impl Fn(&FunctionCall) -> bool) -> bool {
    for stmt in &block.statements {
        match stmt {
            Statement::FunctionDefinition(_) => continue,
            _ if contains_leave(stmt) => return true,
            Statement::Block(inner) => {
                if !block_may_complete(inner, never_returns) {
                    return false;
                }
            }
            _ => {
                // expressions of a statement are evaluated whenever the
                // statement is reached, whatever happens afterwards.
                let mut stops = false;
                for expr in stmt.expressions() {
                    expr.for_each_call(&mut |call| stops |= never_returns(call));
                }
                if stops {
                    return false;
                }
                if !matches!(
                    stmt,
                    Statement::Expression(_)
                        | Statement::VariableDeclaration { .. }
                        | Statement::Assignment { .. }
                ) {
                    return true;
                }
            }
        }
    }
    true
}

fn contains_leave(stmt: &Statement) -> bool {
    match stmt {
        Statement::Leave => true,
        Statement::FunctionDefinition(_) => false,
        _ => stmt
            .child_blocks()
            .into_iter()
            .any(|block| block.statements.iter().any(contains_leave)),
    }
}
