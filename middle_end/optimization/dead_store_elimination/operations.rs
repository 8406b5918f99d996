//! What calls do to memory and storage, as abstract operations on regions.

use crate::middle_end::analysis::side_effects::FunctionSideEffects;
use crate::middle_end::analysis::ssa_values::{ValueMap, ONE, THIRTY_TWO};
use crate::middle_end::dialect::{Effect, Instruction};
use crate::middle_end::sir::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Location {
    Memory,
    Storage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Access {
    Read,
    Write,
}

/// An access to the region `[start, start + length)` of a location.  A
/// missing `start` or `length` is unknown; storage operations have no length
/// (they touch one slot).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub location: Location,
    pub effect: Access,
    pub start: Option<Name>,
    pub length: Option<Name>,
}

impl Operation {
    /// An access to an unknown part of `location`.
    pub fn anywhere(location: Location, effect: Access) -> Self {
        Operation {
            location,
            effect,
            start: None,
            length: None,
        }
    }
}

/// Turns calls into the operations they perform.  Only SSA variables are
/// usable as region bounds: any other argument is unknown.
#[derive(Clone, Copy, Debug)]
pub struct OperationExtractor<'a> {
    side_effects: &'a FunctionSideEffects,
    values: &'a ValueMap,
}

impl<'a> OperationExtractor<'a> {
    pub fn new(side_effects: &'a FunctionSideEffects, values: &'a ValueMap) -> Self {
        OperationExtractor {
            side_effects,
            values,
        }
    }

    fn ssa_arg(&self, args: &[Expression], i: usize) -> Option<Name> {
        match args.get(i) {
            Some(Expression::Identifier(var)) if self.values.is_ssa(var) => Some(var.clone()),
            _ => None,
        }
    }

    // the i-th argument counting from the last one (1-based).
    fn ssa_arg_from_end(&self, args: &[Expression], i: usize) -> Option<Name> {
        args.len()
            .checked_sub(i)
            .and_then(|idx| self.ssa_arg(args, idx))
    }

    pub fn operations(&self, call: &FunctionCall) -> Vec<Operation> {
        use Instruction::*;

        let summary = self.side_effects.get(&call.function_name);
        let args = call.arguments.as_slice();

        if let Some(inst) = Instruction::from_name(call.function_name.as_str()) {
            match inst {
                SStore | SLoad | MStore | MStore8 | MLoad | Revert | Return | ExtCodeCopy
                | CodeCopy | CallDataCopy | ReturnDataCopy | Keccak256 | Log0 | Log1 | Log2
                | Log3 | Log4 => {
                    let effect =
                        if summary.memory == Effect::Write || summary.storage == Effect::Write {
                            Access::Write
                        } else {
                            Access::Read
                        };
                    let location = if matches!(inst, SStore | SLoad) {
                        Location::Storage
                    } else {
                        Location::Memory
                    };
                    let start = if inst == ExtCodeCopy {
                        self.ssa_arg(args, 1)
                    } else {
                        self.ssa_arg(args, 0)
                    };
                    let length = match inst {
                        MStore | MLoad => Some(name(THIRTY_TWO)),
                        MStore8 => Some(name(ONE)),
                        Revert | Return | Keccak256 | Log0 | Log1 | Log2 | Log3 | Log4 => {
                            self.ssa_arg(args, 1)
                        }
                        ExtCodeCopy => self.ssa_arg(args, 3),
                        CallDataCopy | CodeCopy | ReturnDataCopy => self.ssa_arg(args, 2),
                        _ => None,
                    };
                    return vec![Operation {
                        location,
                        effect,
                        start,
                        length,
                    }];
                }
                Call | CallCode | DelegateCall | StaticCall => {
                    return vec![
                        // input area
                        Operation {
                            location: Location::Memory,
                            effect: Access::Read,
                            start: self.ssa_arg_from_end(args, 4),
                            length: self.ssa_arg_from_end(args, 3),
                        },
                        // the callee may call back.  an unknown read is as
                        // strong as an unknown write here.
                        Operation::anywhere(Location::Storage, Access::Read),
                        // output area
                        Operation {
                            location: Location::Memory,
                            effect: Access::Write,
                            start: self.ssa_arg_from_end(args, 2),
                            length: self.ssa_arg_from_end(args, 1),
                        },
                    ];
                }
                Create | Create2 => {
                    return vec![Operation {
                        location: Location::Memory,
                        effect: Access::Read,
                        start: self.ssa_arg(args, 1),
                        length: self.ssa_arg(args, 2),
                    }];
                }
                _ => {}
            }
        }

        let mut ops = vec![];
        if summary.memory != Effect::None {
            ops.push(Operation::anywhere(Location::Memory, Access::Read));
        }
        if summary.storage != Effect::None {
            ops.push(Operation::anywhere(Location::Storage, Access::Read));
        }
        ops
    }
}
