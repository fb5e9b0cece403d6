//! Action (opcode) definitions for the Mite VM.
//!
//! Stack effects are written `( before -- after )` with the top of the
//! stack rightmost. `R:` marks an effect on the return stack.

use crate::error::UndefinedAction;

/// Identifies the operation an action instruction performs.
///
/// The `#[repr(u8)]` attribute gives each variant its stable action code.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    // Control
    /// Stop execution cleanly.
    Halt = 0x00,
    /// No operation.
    Nop = 0x01,

    // Stack manipulation
    /// `( x -- )`
    Pop = 0x02,
    /// `( ... n -- ... x_n )` copy the item `n` deep (0 = top).
    Dup = 0x03,
    /// `( n -- )` exchange the top with the item `n` deep.
    Swap = 0x04,

    // Logic
    /// `( x -- ~x )`
    Not = 0x05,
    /// `( a b -- a&b )`
    And = 0x06,
    /// `( a b -- a|b )`
    Or = 0x07,
    /// `( a b -- a^b )`
    Xor = 0x08,
    /// `( x n -- x<<n )`, 0 when `n` is at least the word width.
    LShift = 0x09,
    /// `( x n -- x>>n )` logical, 0 when `n` is at least the word width.
    RShift = 0x0a,
    /// `( x n -- x>>n )` arithmetic.
    ArShift = 0x0b,

    // Comparison
    /// `( a b -- flag )` 1 if equal, else 0.
    Eq = 0x0c,
    /// `( a b -- flag )` signed `a < b`.
    Lt = 0x0d,
    /// `( a b -- flag )` unsigned `a < b`.
    Ult = 0x0e,

    // Arithmetic
    /// `( a -- -a )`
    Negate = 0x0f,
    /// `( a b -- a+b )`
    Add = 0x10,
    /// `( a b -- a*b )`
    Mul = 0x11,
    /// `( a b -- q r )` signed, truncating towards zero.
    DivMod = 0x12,
    /// `( a b -- q r )` unsigned.
    UDivMod = 0x13,

    // Memory
    /// `( addr -- x )` aligned word load.
    Load = 0x14,
    /// `( x addr -- )` aligned word store.
    Store = 0x15,
    /// `( addr -- b )` byte load, zero-extended.
    LoadB = 0x16,
    /// `( x addr -- )` byte store.
    StoreB = 0x17,

    // Control flow
    /// `( addr -- )`
    Branch = 0x18,
    /// `( flag addr -- )` branch if `flag` is zero.
    BranchZ = 0x19,
    /// `( addr -- )` R: `( -- ret )`
    Call = 0x1a,
    /// R: `( ret -- )`
    Ret = 0x1b,

    // Return stack
    /// `( x -- )` R: `( -- x )`
    ToR = 0x1c,
    /// `( -- x )` R: `( x -- )`
    RFrom = 0x1d,

    // Machine
    /// `( -- n )` bytes per word.
    GetWordSize = 0x1e,
    /// `( -- n )` data-stack depth.
    GetStackDepth = 0x1f,
    /// `( n -- )` set the data-stack depth.
    SetStackDepth = 0x20,
}

/// All actions, in code order. Useful for exhaustive testing.
pub const ALL_ACTIONS: [Action; 33] = [
    Action::Halt,
    Action::Nop,
    Action::Pop,
    Action::Dup,
    Action::Swap,
    Action::Not,
    Action::And,
    Action::Or,
    Action::Xor,
    Action::LShift,
    Action::RShift,
    Action::ArShift,
    Action::Eq,
    Action::Lt,
    Action::Ult,
    Action::Negate,
    Action::Add,
    Action::Mul,
    Action::DivMod,
    Action::UDivMod,
    Action::Load,
    Action::Store,
    Action::LoadB,
    Action::StoreB,
    Action::Branch,
    Action::BranchZ,
    Action::Call,
    Action::Ret,
    Action::ToR,
    Action::RFrom,
    Action::GetWordSize,
    Action::GetStackDepth,
    Action::SetStackDepth,
];

impl TryFrom<u64> for Action {
    type Error = UndefinedAction;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        ALL_ACTIONS
            .get(code as usize)
            .copied()
            .filter(|action| *action as u64 == code)
            .ok_or(UndefinedAction(code))
    }
}

impl Action {
    /// The action's code, as stored in an instruction.
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Returns the assembly mnemonic for this action.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Action::Halt => "HALT",
            Action::Nop => "NOP",
            Action::Pop => "POP",
            Action::Dup => "DUP",
            Action::Swap => "SWAP",
            Action::Not => "NOT",
            Action::And => "AND",
            Action::Or => "OR",
            Action::Xor => "XOR",
            Action::LShift => "LSHIFT",
            Action::RShift => "RSHIFT",
            Action::ArShift => "ARSHIFT",
            Action::Eq => "EQ",
            Action::Lt => "LT",
            Action::Ult => "ULT",
            Action::Negate => "NEGATE",
            Action::Add => "ADD",
            Action::Mul => "MUL",
            Action::DivMod => "DIVMOD",
            Action::UDivMod => "UDIVMOD",
            Action::Load => "LOAD",
            Action::Store => "STORE",
            Action::LoadB => "LOADB",
            Action::StoreB => "STOREB",
            Action::Branch => "BRANCH",
            Action::BranchZ => "BRANCHZ",
            Action::Call => "CALL",
            Action::Ret => "RET",
            Action::ToR => "TO_R",
            Action::RFrom => "R_FROM",
            Action::GetWordSize => "GET_WORD_SIZE",
            Action::GetStackDepth => "GET_STACK_DEPTH",
            Action::SetStackDepth => "SET_STACK_DEPTH",
        }
    }
}
