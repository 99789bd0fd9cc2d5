//! Runtime helpers called from slow paths.
//!
//! JIT code keeps values as 128-bit (tag: u64, payload: u64) slots on a
//! value stack addressed by a pointer to the next free slot. The fast paths
//! only handle the common integer/boolean cases; anything else branches to
//! a slow path that calls one of these helpers through the `JitContext`
//! function table, so generated code never embeds a host address.

use std::mem::offset_of;

/// Value tags for JIT representation.
pub mod tags {
    pub const TAG_INT: u64 = 0;
    pub const TAG_FLOAT: u64 = 1;
    pub const TAG_BOOL: u64 = 2;
    pub const TAG_NIL: u64 = 3;
}

/// Operation selectors passed to `arith` and `compare`.
pub mod op_codes {
    pub const ADD: u32 = 0;
    pub const SUB: u32 = 1;
    pub const MUL: u32 = 2;
    pub const LT: u32 = 3;
    pub const LE: u32 = 4;
    pub const GT: u32 = 5;
    pub const GE: u32 = 6;
}

/// JIT value representation (128-bit: tag + payload).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JitValue {
    pub tag: u64,
    pub payload: u64,
}

impl JitValue {
    pub const NIL: JitValue = JitValue {
        tag: tags::TAG_NIL,
        payload: 0,
    };

    pub fn int(n: i64) -> Self {
        JitValue {
            tag: tags::TAG_INT,
            payload: n as u64,
        }
    }

    pub fn float(f: f64) -> Self {
        JitValue {
            tag: tags::TAG_FLOAT,
            payload: f.to_bits(),
        }
    }

    pub fn bool(b: bool) -> Self {
        JitValue {
            tag: tags::TAG_BOOL,
            payload: b as u64,
        }
    }

    fn as_f64(self) -> Option<f64> {
        match self.tag {
            tags::TAG_INT => Some(self.payload as i64 as f64),
            tags::TAG_FLOAT => Some(f64::from_bits(self.payload)),
            _ => None,
        }
    }

    pub fn is_truthy(self) -> bool {
        match self.tag {
            tags::TAG_BOOL => self.payload != 0,
            tags::TAG_NIL => false,
            _ => true,
        }
    }
}

/// Stack-popping binary helper: `(ctx, sp, op) -> new sp`.
pub type BinaryStub = unsafe extern "C" fn(*mut JitContext, *mut JitValue, u64) -> *mut JitValue;
/// In-place unary helper: `(ctx, sp) -> sp`.
pub type UnaryStub = unsafe extern "C" fn(*mut JitContext, *mut JitValue) -> *mut JitValue;
/// Truthiness of the top of stack: `(ctx, sp) -> 0 | 1`. Does not pop.
pub type TruthyStub = unsafe extern "C" fn(*mut JitContext, *const JitValue) -> u64;

/// VM context passed to compiled code (in the VM context register).
#[repr(C)]
pub struct JitContext {
    pub arith: BinaryStub,
    pub compare: BinaryStub,
    pub negate: UnaryStub,
    pub not: UnaryStub,
    pub truthy: TruthyStub,
    /// Number of slow-path helper calls.
    pub slow_path_hits: u64,
    /// Number of operations applied to operands of the wrong type.
    pub type_errors: u64,
}

impl JitContext {
    pub fn new() -> Self {
        JitContext {
            arith: jit_arith,
            compare: jit_compare,
            negate: jit_negate,
            not: jit_not,
            truthy: jit_truthy,
            slow_path_hits: 0,
            type_errors: 0,
        }
    }
}

impl Default for JitContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Slow-path helpers, addressed by their slot in `JitContext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stub {
    Arith,
    Compare,
    Negate,
    Not,
    Truthy,
}

impl Stub {
    /// Byte offset of the helper's function pointer in `JitContext`.
    pub fn context_offset(self) -> i32 {
        let offset = match self {
            Stub::Arith => offset_of!(JitContext, arith),
            Stub::Compare => offset_of!(JitContext, compare),
            Stub::Negate => offset_of!(JitContext, negate),
            Stub::Not => offset_of!(JitContext, not),
            Stub::Truthy => offset_of!(JitContext, truthy),
        };
        offset as i32
    }
}

fn arith(op: u32, a: JitValue, b: JitValue) -> Option<JitValue> {
    if a.tag == tags::TAG_INT && b.tag == tags::TAG_INT {
        let (x, y) = (a.payload as i64, b.payload as i64);
        let exact = match op {
            op_codes::ADD => x.checked_add(y),
            op_codes::SUB => x.checked_sub(y),
            op_codes::MUL => x.checked_mul(y),
            _ => return None,
        };
        if let Some(n) = exact {
            return Some(JitValue::int(n));
        }
    }

    // Mixed operands and integer overflow both fall back to floating point.
    let (x, y) = (a.as_f64()?, b.as_f64()?);
    let result = match op {
        op_codes::ADD => x + y,
        op_codes::SUB => x - y,
        op_codes::MUL => x * y,
        _ => return None,
    };
    Some(JitValue::float(result))
}

fn compare(op: u32, a: JitValue, b: JitValue) -> Option<JitValue> {
    let result = if a.tag == tags::TAG_INT && b.tag == tags::TAG_INT {
        let (x, y) = (a.payload as i64, b.payload as i64);
        match op {
            op_codes::LT => x < y,
            op_codes::LE => x <= y,
            op_codes::GT => x > y,
            op_codes::GE => x >= y,
            _ => return None,
        }
    } else {
        let (x, y) = (a.as_f64()?, b.as_f64()?);
        match op {
            op_codes::LT => x < y,
            op_codes::LE => x <= y,
            op_codes::GT => x > y,
            op_codes::GE => x >= y,
            _ => return None,
        }
    };
    Some(JitValue::bool(result))
}

fn negate(v: JitValue) -> Option<JitValue> {
    match v.tag {
        tags::TAG_INT => {
            let n = v.payload as i64;
            Some(match n.checked_neg() {
                Some(n) => JitValue::int(n),
                None => JitValue::float(-(n as f64)),
            })
        }
        tags::TAG_FLOAT => Some(JitValue::float(-f64::from_bits(v.payload))),
        _ => None,
    }
}

/// # Safety
///
/// `ctx` must be valid and `sp` must have at least two initialized slots
/// below it.
pub unsafe extern "C" fn jit_arith(
    ctx: *mut JitContext,
    sp: *mut JitValue,
    op: u64,
) -> *mut JitValue {
    unsafe { binary(ctx, sp, |a, b| arith(op as u32, a, b)) }
}

/// # Safety
///
/// Same as `jit_arith`.
pub unsafe extern "C" fn jit_compare(
    ctx: *mut JitContext,
    sp: *mut JitValue,
    op: u64,
) -> *mut JitValue {
    unsafe { binary(ctx, sp, |a, b| compare(op as u32, a, b)) }
}

/// # Safety
///
/// `ctx` must be valid and `sp` must have at least one initialized slot
/// below it.
pub unsafe extern "C" fn jit_negate(ctx: *mut JitContext, sp: *mut JitValue) -> *mut JitValue {
    unsafe { unary(ctx, sp, negate) }
}

/// # Safety
///
/// Same as `jit_negate`.
pub unsafe extern "C" fn jit_not(ctx: *mut JitContext, sp: *mut JitValue) -> *mut JitValue {
    unsafe { unary(ctx, sp, |v| Some(JitValue::bool(!v.is_truthy()))) }
}

/// # Safety
///
/// Same as `jit_negate`.
pub unsafe extern "C" fn jit_truthy(ctx: *mut JitContext, sp: *const JitValue) -> u64 {
    unsafe {
        (*ctx).slow_path_hits += 1;
        (*sp.sub(1)).is_truthy() as u64
    }
}

unsafe fn binary(
    ctx: *mut JitContext,
    sp: *mut JitValue,
    f: impl FnOnce(JitValue, JitValue) -> Option<JitValue>,
) -> *mut JitValue {
    unsafe {
        (*ctx).slow_path_hits += 1;
        let lhs = sp.sub(2);
        let rhs = sp.sub(1);
        *lhs = f(*lhs, *rhs).unwrap_or_else(|| {
            (*ctx).type_errors += 1;
            JitValue::NIL
        });
        rhs
    }
}

unsafe fn unary(
    ctx: *mut JitContext,
    sp: *mut JitValue,
    f: impl FnOnce(JitValue) -> Option<JitValue>,
) -> *mut JitValue {
    unsafe {
        (*ctx).slow_path_hits += 1;
        let top = sp.sub(1);
        *top = f(*top).unwrap_or_else(|| {
            (*ctx).type_errors += 1;
            JitValue::NIL
        });
        sp
    }
}
