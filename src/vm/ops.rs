use std::fmt;
use std::str::FromStr;

/// Bytecode operations understood by the baseline JIT.
///
/// Values are dynamically typed (int, bool, nil, float); arithmetic and
/// comparisons have an integer fast path and fall back to a runtime stub
/// for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // ========================================
    // Constants
    // ========================================
    PushInt(i64),
    PushTrue,
    PushFalse,
    PushNil,

    // ========================================
    // Stack Manipulation
    // ========================================
    Pop,
    Dup,

    // ========================================
    // Local Variables
    // ========================================
    LoadLocal(usize),
    StoreLocal(usize),

    // ========================================
    // Arithmetic
    // ========================================
    Add,
    Sub,
    Mul,
    Neg,

    // ========================================
    // Logic / Comparison
    // ========================================
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // ========================================
    // Control Flow
    // ========================================
    Jmp(usize),
    JmpIfFalse(usize),
    JmpIfTrue(usize),
    Nop,
    Ret,
}

impl Op {
    /// Mnemonic used by both `Display` and `FromStr`.
    pub fn name(&self) -> &'static str {
        match self {
            Op::PushInt(_) => "push_int",
            Op::PushTrue => "push_true",
            Op::PushFalse => "push_false",
            Op::PushNil => "push_nil",
            Op::Pop => "pop",
            Op::Dup => "dup",
            Op::LoadLocal(_) => "load_local",
            Op::StoreLocal(_) => "store_local",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Neg => "neg",
            Op::Not => "not",
            Op::Eq => "eq",
            Op::Ne => "ne",
            Op::Lt => "lt",
            Op::Le => "le",
            Op::Gt => "gt",
            Op::Ge => "ge",
            Op::Jmp(_) => "jmp",
            Op::JmpIfFalse(_) => "jmp_if_false",
            Op::JmpIfTrue(_) => "jmp_if_true",
            Op::Nop => "nop",
            Op::Ret => "ret",
        }
    }

    /// Jump target, if this is a branch.
    pub fn jump_target(&self) -> Option<usize> {
        match self {
            Op::Jmp(target) | Op::JmpIfFalse(target) | Op::JmpIfTrue(target) => Some(*target),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::PushInt(v) => write!(f, "{} {}", self.name(), v),
            Op::LoadLocal(slot) | Op::StoreLocal(slot) => write!(f, "{} {}", self.name(), slot),
            Op::Jmp(target) | Op::JmpIfFalse(target) | Op::JmpIfTrue(target) => {
                write!(f, "{} {}", self.name(), target)
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// Error returned when an instruction's text form cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseOpError {
    #[error("empty instruction")]
    Empty,
    #[error("unknown instruction `{0}`")]
    UnknownMnemonic(String),
    #[error("`{0}` expects one operand")]
    MissingOperand(&'static str),
    #[error("`{0}` takes no operands")]
    UnexpectedOperand(&'static str),
    #[error("unexpected trailing operand `{0}`")]
    TrailingOperand(String),
    #[error("invalid operand `{operand}` for `{mnemonic}`")]
    InvalidOperand {
        mnemonic: &'static str,
        operand: String,
    },
}

impl FromStr for Op {
    type Err = ParseOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let mnemonic = parts.next().ok_or(ParseOpError::Empty)?.to_ascii_lowercase();
        let operand = parts.next();
        if let Some(extra) = parts.next() {
            return Err(ParseOpError::TrailingOperand(extra.to_string()));
        }

        let nullary = |op: Op| match operand {
            None => Ok(op),
            Some(_) => Err(ParseOpError::UnexpectedOperand(op.name())),
        };

        match mnemonic.as_str() {
            "push_int" => Ok(Op::PushInt(parse_operand("push_int", operand)?)),
            "load_local" => Ok(Op::LoadLocal(parse_operand("load_local", operand)?)),
            "store_local" => Ok(Op::StoreLocal(parse_operand("store_local", operand)?)),
            "jmp" => Ok(Op::Jmp(parse_operand("jmp", operand)?)),
            "jmp_if_false" => Ok(Op::JmpIfFalse(parse_operand("jmp_if_false", operand)?)),
            "jmp_if_true" => Ok(Op::JmpIfTrue(parse_operand("jmp_if_true", operand)?)),
            "push_true" => nullary(Op::PushTrue),
            "push_false" => nullary(Op::PushFalse),
            "push_nil" => nullary(Op::PushNil),
            "pop" => nullary(Op::Pop),
            "dup" => nullary(Op::Dup),
            "add" => nullary(Op::Add),
            "sub" => nullary(Op::Sub),
            "mul" => nullary(Op::Mul),
            "neg" => nullary(Op::Neg),
            "not" => nullary(Op::Not),
            "eq" => nullary(Op::Eq),
            "ne" => nullary(Op::Ne),
            "lt" => nullary(Op::Lt),
            "le" => nullary(Op::Le),
            "gt" => nullary(Op::Gt),
            "ge" => nullary(Op::Ge),
            "nop" => nullary(Op::Nop),
            "ret" => nullary(Op::Ret),
            _ => Err(ParseOpError::UnknownMnemonic(mnemonic)),
        }
    }
}

fn parse_operand<T: FromStr>(mnemonic: &'static str, operand: Option<&str>) -> Result<T, ParseOpError> {
    let text = operand.ok_or(ParseOpError::MissingOperand(mnemonic))?;
    text.parse().map_err(|_| ParseOpError::InvalidOperand {
        mnemonic,
        operand: text.to_string(),
    })
}
