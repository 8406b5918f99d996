//! Symbolic facts about SSA values.
//!
//! The knowledge base rewrites a variable into `reference + offset`, following
//! SSA definitions through literals, copies, and additions or subtractions of
//! constants.  Two values built on the same reference have a known constant
//! difference.  All arithmetic wraps around at 2^256, like the machine does.

use primitive_types::U256;

use super::ssa_values::ValueMap;
use crate::middle_end::dialect::Instruction;
use crate::middle_end::sir::*;

/// Questions the store optimizer asks about symbolic values.  Answers may err
/// on the side of "unknown" but must never be wrong.
pub trait Knowledge {
    /// `a - b` (wrapping), if it is the same constant on every execution.
    fn difference_if_known_constant(&self, a: &Name, b: &Name) -> Option<U256>;

    /// The value of `a`, if it is a constant.
    fn value_if_known_constant(&self, a: &Name) -> Option<U256>;

    fn known_to_be_different(&self, a: &Name, b: &Name) -> bool {
        matches!(self.difference_if_known_constant(a, b), Some(d) if !d.is_zero())
    }

    fn known_to_be_zero(&self, a: &Name) -> bool {
        matches!(self.value_if_known_constant(a), Some(v) if v.is_zero())
    }
}

/// A value as an offset from a reference variable.  A missing reference means
/// the value is the constant `offset`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableOffset {
    pub reference: Option<Name>,
    pub offset: U256,
}

// definitions are followed this many levels deep at most.
const MAX_DEPTH: usize = 32;

#[derive(Clone, Copy, Debug)]
pub struct KnowledgeBase<'a> {
    values: &'a ValueMap,
}

impl<'a> KnowledgeBase<'a> {
    pub fn new(values: &'a ValueMap) -> Self {
        KnowledgeBase { values }
    }

    /// `var` as `reference + offset`.  Variables whose definition can't be
    /// rewritten are their own reference.
    pub fn explore(&self, var: &Name) -> VariableOffset {
        self.explore_name(var, 0)
    }

    fn explore_name(&self, var: &Name, depth: usize) -> VariableOffset {
        let opaque = VariableOffset {
            reference: Some(var.clone()),
            offset: U256::zero(),
        };
        if depth >= MAX_DEPTH {
            return opaque;
        }
        self.values
            .get(var)
            .and_then(|def| self.explore_expr(def, depth + 1))
            .unwrap_or(opaque)
    }

    // None when the expression depends on something that is not an SSA
    // variable, in which case the variable it defines stays opaque.
    fn explore_expr(&self, expr: &Expression, depth: usize) -> Option<VariableOffset> {
        match expr {
            Expression::Literal(lit) => Some(VariableOffset {
                reference: None,
                offset: lit.value(),
            }),
            Expression::Identifier(var) if self.values.is_ssa(var) => {
                Some(self.explore_name(var, depth))
            }
            Expression::Identifier(_) => None,
            Expression::Call(call) => {
                let inst = Instruction::from_name(call.function_name.as_str())?;
                match (inst, call.arguments.as_slice()) {
                    (Instruction::Add, [a, b]) => {
                        let a = self.explore_expr(a, depth)?;
                        let b = self.explore_expr(b, depth)?;
                        match (a.reference, b.reference) {
                            (reference, None) | (None, reference) => Some(VariableOffset {
                                reference,
                                offset: a.offset.overflowing_add(b.offset).0,
                            }),
                            _ => None,
                        }
                    }
                    (Instruction::Sub, [a, b]) => {
                        let a = self.explore_expr(a, depth)?;
                        let b = self.explore_expr(b, depth)?;
                        match b.reference {
                            None => Some(VariableOffset {
                                reference: a.reference,
                                offset: a.offset.overflowing_sub(b.offset).0,
                            }),
                            Some(_) => None,
                        }
                    }
                    _ => None,
                }
            }
        }
    }
}

impl<'a> Knowledge for KnowledgeBase<'a> {
    fn difference_if_known_constant(&self, a: &Name, b: &Name) -> Option<U256> {
        let a = self.explore(a);
        let b = self.explore(b);
        if a.reference == b.reference {
            Some(a.offset.overflowing_sub(b.offset).0)
        } else {
            None
        }
    }

    fn value_if_known_constant(&self, a: &Name) -> Option<U256> {
        match self.explore(a) {
            VariableOffset {
                reference: None,
                offset,
            } => Some(offset),
            _ => None,
        }
    }
}
