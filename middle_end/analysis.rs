//! Static analysis of sir programs.
//!
//! Besides the whole-program analyses in the submodules, this module holds the
//! structured walker: a forward traversal that follows the nesting of the
//! program instead of a control-flow graph.  Branches are walked from copies
//! of the abstract environment and joined afterwards, and loops are walked
//! twice (once if they are nested too deeply), which is enough for analyses
//! whose environments only ever move up a finite lattice.

use std::mem;

use super::sir::*;

pub mod call_graph;
pub mod knowledge_base;
pub mod side_effects;
pub mod ssa_values;

#[cfg(test)]
mod tests;

/// Loops nested at least this deep are only walked once.
pub const DEFAULT_MAX_LOOP_NESTING: usize = 6;

/// The abstract environment (the abstract state) carried along the program.
/// `Default` is the environment of unreachable code, so it must be the
/// neutral element of `join_with`.
pub trait AbstractEnv: Clone + Default {
    // compute self = self ⊔ rhs
    fn join_with(&mut self, rhs: Self);
}

/// An analysis driven by [forward_walk].  The walker owns the traversal order
/// and the environment's control flow: it saves, copies and joins the
/// environment returned by `env` around branches, loops and function bodies.
/// The hooks only see straight-line events.
pub trait StructuredAnalysis {
    type Env: AbstractEnv;

    fn env(&mut self) -> &mut Self::Env;

    /// A call, after its arguments (which are evaluated right to left).
    fn visit_call(&mut self, _call: &FunctionCall) {}

    /// A statement, after everything nested in it.
    fn visit_statement(&mut self, _id: StmtId, _stmt: &Statement) {}

    fn visit_leave(&mut self) {}

    /// Called on a fresh environment, before the body is walked.
    fn enter_function(&mut self, _def: &FunctionDefinition) {}

    /// Called after the body is walked, before the outer environment is
    /// restored.
    fn leave_function(&mut self, _def: &FunctionDefinition) {}

    /// Called instead of the second iteration of a loop nested too deeply.
    /// `zero_runs` is the environment from before the first iteration.
    fn shortcut_nested_loop(&mut self, _zero_runs: &Self::Env) {}
}

// environments waiting at the exits of the innermost loop.
struct LoopInfo<E> {
    pending_breaks: Vec<E>,
    pending_continues: Vec<E>,
}

impl<E> Default for LoopInfo<E> {
    fn default() -> Self {
        LoopInfo {
            pending_breaks: vec![],
            pending_continues: vec![],
        }
    }
}

struct Walker<'a, A: StructuredAnalysis> {
    analysis: &'a mut A,
    max_loop_nesting: usize,
    loop_depth: usize,
    loop_info: LoopInfo<A::Env>,
}

/// Walk the whole program, calling the hooks of `analysis` in program order.
/// Statement ids are pre-order positions in the program tree (see [StmtId]),
/// and a statement walked twice (inside a loop) gets the same id both times.
pub fn forward_walk<A: StructuredAnalysis>(
    program: &Program,
    analysis: &mut A,
    max_loop_nesting: usize,
) {
    let mut walker = Walker {
        analysis,
        max_loop_nesting,
        loop_depth: 0,
        loop_info: LoopInfo::default(),
    };
    walker.block(&program.code, StmtId(0));
}

fn join_all<E: AbstractEnv>(env: &mut E, others: Vec<E>) {
    for other in others {
        env.join_with(other);
    }
}

impl<'a, A: StructuredAnalysis> Walker<'a, A> {
    fn env(&mut self) -> &mut A::Env {
        self.analysis.env()
    }

    fn block(&mut self, block: &Block, first: StmtId) {
        let mut id = first;
        for stmt in &block.statements {
            self.statement(id, stmt);
            id = id.offset(stmt.subtree_len());
        }
    }

    fn expression(&mut self, expr: &Expression) {
        if let Expression::Call(call) = expr {
            for arg in call.arguments.iter().rev() {
                self.expression(arg);
            }
            self.analysis.visit_call(call);
        }
    }

    fn statement(&mut self, id: StmtId, stmt: &Statement) {
        match stmt {
            Statement::Expression(e) => self.expression(e),
            Statement::VariableDeclaration { value, .. } => {
                if let Some(value) = value {
                    self.expression(value);
                }
            }
            Statement::Assignment { value, .. } => self.expression(value),
            Statement::If { condition, body } => {
                self.expression(condition);
                let skip = self.env().clone();
                self.block(body, id.offset(1));
                self.env().join_with(skip);
            }
            Statement::Switch { expression, cases } => {
                self.expression(expression);
                let pre = self.env().clone();
                let has_default = cases.iter().any(|c| c.value.is_none());

                // without a default, no case may be taken at all.
                let mut joined = if has_default {
                    None
                } else {
                    Some(pre.clone())
                };
                let mut first = id.offset(1);
                for case in cases {
                    *self.env() = pre.clone();
                    self.block(&case.body, first);
                    first = first.offset(case.body.subtree_len());

                    let after = mem::take(self.env());
                    joined = Some(match joined {
                        Some(mut acc) => {
                            acc.join_with(after);
                            acc
                        }
                        None => after,
                    });
                }
                *self.env() = joined.unwrap_or(pre);
            }
            Statement::ForLoop {
                pre,
                condition,
                post,
                body,
            } => {
                let pre_first = id.offset(1);
                let post_first = pre_first.offset(pre.subtree_len());
                let body_first = post_first.offset(post.subtree_len());

                self.block(pre, pre_first);

                let outer_info = mem::take(&mut self.loop_info);
                self.loop_depth += 1;

                self.expression(condition);
                let zero_runs = self.env().clone();

                self.loop_iteration(condition, post, post_first, body, body_first);

                if self.loop_depth < self.max_loop_nesting {
                    let one_run = self.env().clone();
                    self.loop_iteration(condition, post, post_first, body, body_first);
                    self.env().join_with(one_run);
                } else {
                    log::trace!("loop at statement {id} is nested too deeply, walking it once");
                    self.analysis.shortcut_nested_loop(&zero_runs);
                }

                self.env().join_with(zero_runs);
                let breaks = mem::take(&mut self.loop_info.pending_breaks);
                join_all(self.env(), breaks);

                self.loop_info = outer_info;
                self.loop_depth -= 1;
            }
            Statement::FunctionDefinition(def) => {
                let outer_env = mem::take(self.env());
                let outer_info = mem::take(&mut self.loop_info);
                let outer_depth = mem::replace(&mut self.loop_depth, 0);

                self.analysis.enter_function(def);
                self.block(&def.body, id.offset(1));
                self.analysis.leave_function(def);

                *self.env() = outer_env;
                self.loop_info = outer_info;
                self.loop_depth = outer_depth;
            }
            Statement::Break => {
                let env = mem::take(self.env());
                self.loop_info.pending_breaks.push(env);
            }
            Statement::Continue => {
                let env = mem::take(self.env());
                self.loop_info.pending_continues.push(env);
            }
            Statement::Leave => self.analysis.visit_leave(),
            Statement::Block(block) => self.block(block, id.offset(1)),
        }

        self.analysis.visit_statement(id, stmt);
    }

    // body, then the states of `continue` join the end of the body, then post
    // and the condition.
    fn loop_iteration(
        &mut self,
        condition: &Expression,
        post: &Block,
        post_first: StmtId,
        body: &Block,
        body_first: StmtId,
    ) {
        self.block(body, body_first);
        let continues = mem::take(&mut self.loop_info.pending_continues);
        join_all(self.env(), continues);
        self.block(post, post_first);
        self.expression(condition);
    }
}
