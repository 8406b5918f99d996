//! The builtin instructions of the structured IR and what they do to memory,
//! storage and control flow.
//!
//! Builtins have fixed effects.  User-defined functions get theirs from
//! [crate::middle_end::analysis::side_effects], which starts from this table.

use serde::{Deserialize, Serialize};

/// How a callable touches one location.  Ordered by strength, so joining two
/// effects is taking the `max`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Effect {
    #[default]
    None,
    Read,
    Write,
}

/// Coarse summary of what calling something may do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SideEffects {
    pub memory: Effect,
    pub storage: Effect,
    // the call never returns to its caller.
    pub terminates: bool,
    // the call never returns, and whenever it stops execution it reverts.
    pub reverts: bool,
}

impl SideEffects {
    /// What an unknown callable may do: anything, including coming back.
    pub fn worst() -> Self {
        SideEffects {
            memory: Effect::Write,
            storage: Effect::Write,
            terminates: false,
            reverts: false,
        }
    }
}

macro_rules! instructions {
    ($($variant:ident => $name:literal, $arity:literal, $returns:literal;)*) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum Instruction {
            $($variant,)*
        }

        impl Instruction {
            pub const ALL: &'static [Instruction] = &[$(Instruction::$variant,)*];

            /// The builtin spelled `name`, if there is one.
            pub fn from_name(name: &str) -> Option<Instruction> {
                match name {
                    $($name => Some(Instruction::$variant),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Instruction::$variant => $name,)*
                }
            }

            /// Number of arguments.
            pub fn arity(self) -> usize {
                match self {
                    $(Instruction::$variant => $arity,)*
                }
            }

            /// Number of returned values (zero or one).
            pub fn returns(self) -> usize {
                match self {
                    $(Instruction::$variant => $returns,)*
                }
            }
        }
    };
}

instructions! {
    Stop => "stop", 0, 0;
    Add => "add", 2, 1;
    Sub => "sub", 2, 1;
    Mul => "mul", 2, 1;
    Div => "div", 2, 1;
    Sdiv => "sdiv", 2, 1;
    Mod => "mod", 2, 1;
    Smod => "smod", 2, 1;
    Exp => "exp", 2, 1;
    Not => "not", 1, 1;
    Lt => "lt", 2, 1;
    Gt => "gt", 2, 1;
    Slt => "slt", 2, 1;
    Sgt => "sgt", 2, 1;
    Eq => "eq", 2, 1;
    IsZero => "iszero", 1, 1;
    And => "and", 2, 1;
    Or => "or", 2, 1;
    Xor => "xor", 2, 1;
    Byte => "byte", 2, 1;
    Shl => "shl", 2, 1;
    Shr => "shr", 2, 1;
    Sar => "sar", 2, 1;
    AddMod => "addmod", 3, 1;
    MulMod => "mulmod", 3, 1;
    SignExtend => "signextend", 2, 1;
    Keccak256 => "keccak256", 2, 1;
    Pop => "pop", 1, 0;
    MLoad => "mload", 1, 1;
    MStore => "mstore", 2, 0;
    MStore8 => "mstore8", 2, 0;
    SLoad => "sload", 1, 1;
    SStore => "sstore", 2, 0;
    MSize => "msize", 0, 1;
    Gas => "gas", 0, 1;
    Address => "address", 0, 1;
    Balance => "balance", 1, 1;
    SelfBalance => "selfbalance", 0, 1;
    Caller => "caller", 0, 1;
    CallValue => "callvalue", 0, 1;
    CallDataLoad => "calldataload", 1, 1;
    CallDataSize => "calldatasize", 0, 1;
    CallDataCopy => "calldatacopy", 3, 0;
    CodeSize => "codesize", 0, 1;
    CodeCopy => "codecopy", 3, 0;
    ExtCodeSize => "extcodesize", 1, 1;
    ExtCodeCopy => "extcodecopy", 4, 0;
    ExtCodeHash => "extcodehash", 1, 1;
    ReturnDataSize => "returndatasize", 0, 1;
    ReturnDataCopy => "returndatacopy", 3, 0;
    Create => "create", 3, 1;
    Create2 => "create2", 4, 1;
    Call => "call", 7, 1;
    CallCode => "callcode", 7, 1;
    DelegateCall => "delegatecall", 6, 1;
    StaticCall => "staticcall", 6, 1;
    Return => "return", 2, 0;
    Revert => "revert", 2, 0;
    SelfDestruct => "selfdestruct", 1, 0;
    Invalid => "invalid", 0, 0;
    Log0 => "log0", 2, 0;
    Log1 => "log1", 3, 0;
    Log2 => "log2", 4, 0;
    Log3 => "log3", 5, 0;
    Log4 => "log4", 6, 0;
    ChainId => "chainid", 0, 1;
    BaseFee => "basefee", 0, 1;
    Origin => "origin", 0, 1;
    GasPrice => "gasprice", 0, 1;
    BlockHash => "blockhash", 1, 1;
    Coinbase => "coinbase", 0, 1;
    Timestamp => "timestamp", 0, 1;
    Number => "number", 0, 1;
    PrevRandao => "prevrandao", 0, 1;
    GasLimit => "gaslimit", 0, 1;
}

impl Instruction {
    pub fn side_effects(self) -> SideEffects {
        use Effect::*;
        use Instruction::*;

        let (memory, storage) = match self {
            MLoad | MSize | Keccak256 | Log0 | Log1 | Log2 | Log3 | Log4 | Return | Revert => {
                (Read, None)
            }
            MStore | MStore8 | CallDataCopy | CodeCopy | ExtCodeCopy | ReturnDataCopy => {
                (Write, None)
            }
            SLoad => (None, Read),
            SStore => (None, Write),
            Call | CallCode | DelegateCall => (Write, Write),
            StaticCall => (Write, Read),
            Create | Create2 => (Read, Write),
            _ => (None, None),
        };
        let terminates = self.terminates();
        SideEffects {
            memory,
            storage,
            terminates,
            reverts: terminates && matches!(self, Revert | Invalid),
        }
    }

    /// Whether execution never continues after this instruction.
    pub fn terminates(self) -> bool {
        matches!(
            self,
            Instruction::Stop
                | Instruction::Return
                | Instruction::Revert
                | Instruction::SelfDestruct
                | Instruction::Invalid
        )
    }

    /// Whether this instruction ends execution successfully, keeping the
    /// storage written so far.
    pub fn stops_successfully(self) -> bool {
        self.terminates() && !self.side_effects().reverts
    }

    /// Store-class instructions whose statements may be removed.
    pub fn is_store(self) -> bool {
        matches!(
            self,
            Instruction::SStore
                | Instruction::MStore
                | Instruction::MStore8
                | Instruction::CallDataCopy
                | Instruction::CodeCopy
                | Instruction::ExtCodeCopy
                | Instruction::ReturnDataCopy
        )
    }
}
