//! Call graph of a sir program.
//!
//! Calls are always direct, so the graph is exact: a function's callees are
//! the names called anywhere in its body, except inside nested function
//! definitions, which are nodes of their own.  Names that are neither builtins
//! nor defined functions are external functions and have no outgoing edges.

use std::collections::{BTreeMap as Map, BTreeSet as Set};

use crate::middle_end::dialect::Instruction;
use crate::middle_end::sir::*;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallGraph {
    /// Names called directly by each defined function.
    pub callees: Map<Name, Set<Name>>,
}

// names called in a block, not descending into function definitions.
fn direct_calls(block: &Block, calls: &mut Set<Name>) {
    for stmt in &block.statements {
        if matches!(stmt, Statement::FunctionDefinition(_)) {
            continue;
        }
        for expr in stmt.expressions() {
            expr.for_each_call(&mut |call| {
                calls.insert(call.function_name.clone());
            });
        }
        for child in stmt.child_blocks() {
            direct_calls(child, calls);
        }
    }
}

impl CallGraph {
    pub fn new(program: &Program) -> Self {
        let callees = program
            .function_definitions()
            .into_iter()
            .map(|def| {
                let mut calls = Set::new();
                direct_calls(&def.body, &mut calls);
                (def.name.clone(), calls)
            })
            .collect();

        CallGraph { callees }
    }

    /// Everything `f` may end up calling, directly or not.  `f` itself is
    /// included only if it is recursive.
    pub fn reachable(&self, f: &Name) -> Set<Name> {
        let mut reached = Set::new();
        let mut worklist: Vec<&Name> = self.callees.get(f).into_iter().flatten().collect();

        while let Some(g) = worklist.pop() {
            if reached.insert(g.clone()) {
                worklist.extend(self.callees.get(g).into_iter().flatten());
            }
        }

        reached
    }
}

/// Whether `msize` is called anywhere in the program.  Its result depends on
/// every memory access ever made, so no memory store can be removed.
pub fn contains_msize(program: &Program) -> bool {
    fn in_block(block: &Block) -> bool {
        block.statements.iter().any(|stmt| {
            let mut found = false;
            for expr in stmt.expressions() {
                expr.for_each_call(&mut |call| {
                    found |= Instruction::from_name(call.function_name.as_str())
                        == Some(Instruction::MSize);
                });
            }
            found || stmt.child_blocks().into_iter().any(in_block)
        })
    }

    in_block(&program.code)
}
