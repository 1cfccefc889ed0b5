//! Instruction codec: one canonical bit layout, used by both `encode` and
//! `decode`, and a decoded [`Instr`] form so raw bit offsets never leak into
//! the execution loop.
//!
//! Word layout (32 bits):
//!
//! ```text
//! [31:28] opcode
//! [27:23] r0
//! register form:  [22:18] r1   [17:13] r2   [12:0] zero
//! immediate form: [22:0] unsigned imm
//! ```

use std::fmt;

use serde::Serialize;

use crate::fault::FaultKind;

// ── Bit layout ───────────────────────────────────────────────────────

const OPCODE_SHIFT: u32 = 28;
const R0_SHIFT: u32 = 23;
const R1_SHIFT: u32 = 18;
const R2_SHIFT: u32 = 13;
const REG_MASK: u32 = 0x1F;
const IMM_MASK: u32 = 0x007F_FFFF;

/// Largest register index an instruction operand can name.
pub const MAX_REG: u8 = REG_MASK as u8;
/// Largest unsigned immediate an instruction operand can carry.
pub const MAX_IMM: u32 = IMM_MASK;

// ── Opcodes ──────────────────────────────────────────────────────────

/// The 4-bit operation selector. Numbering is part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Opcode {
    Halt = 0,
    LoadI = 1,
    LoadS = 2,
    LoadSd = 3,
    LoadC = 4,
    Add = 5,
    Sub = 6,
    Move = 7,
    Call = 8,
    CallCl = 9,
    Ret = 10,
    MakeCl = 11,
    Jmp = 12,
    Match = 13,
}

impl Opcode {
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Halt => "HALT",
            Opcode::LoadI => "LOADi",
            Opcode::LoadS => "LOADs",
            Opcode::LoadSd => "LOADsd",
            Opcode::LoadC => "LOADc",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Move => "MOVE",
            Opcode::Call => "CALL",
            Opcode::CallCl => "CALLCL",
            Opcode::Ret => "RET",
            Opcode::MakeCl => "MAKECL",
            Opcode::Jmp => "JMP",
            Opcode::Match => "MATCH",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = FaultKind;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Opcode::Halt,
            1 => Opcode::LoadI,
            2 => Opcode::LoadS,
            3 => Opcode::LoadSd,
            4 => Opcode::LoadC,
            5 => Opcode::Add,
            6 => Opcode::Sub,
            7 => Opcode::Move,
            8 => Opcode::Call,
            9 => Opcode::CallCl,
            10 => Opcode::Ret,
            11 => Opcode::MakeCl,
            12 => Opcode::Jmp,
            13 => Opcode::Match,
            _ => {
                return Err(FaultKind::EncodingError {
                    reason: format!("unknown opcode {}", value),
                });
            }
        })
    }
}

// ── Decoded instructions ─────────────────────────────────────────────

/// A fully decoded instruction. The shape (register vs. immediate) is fixed
/// by the opcode; no variant mixes both interpretations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    Halt,
    /// `dst := Number(imm)`
    LoadI { dst: u8, imm: u32 },
    /// `dst := Symbol(imm)`
    LoadS { dst: u8, imm: u32 },
    /// `dst :=` data symbol at constant index `imm`
    LoadSd { dst: u8, imm: u32 },
    /// `dst := constants[imm]` (scalar)
    LoadC { dst: u8, imm: u32 },
    Add { dst: u8, lhs: u8, rhs: u8 },
    Sub { dst: u8, lhs: u8, rhs: u8 },
    Move { dst: u8, src: u8 },
    /// Call the address in register `base`; arguments in `base+1..=base+argc`.
    Call { dst: u8, base: u8, argc: u8 },
    /// Call the closure in register `base`; arguments as with `Call`.
    CallCl { dst: u8, base: u8, argc: u8 },
    Ret,
    /// Build a closure over the address in register `base`, capturing
    /// `base+1..=base+capc`.
    MakeCl { dst: u8, base: u8, capc: u8 },
    /// `pc := pc + 1 + offset`
    Jmp { offset: u32 },
    /// Match register `subject` against the pattern table whose constant
    /// index is in register `table`; bindings land at `bind_base + slot`.
    Match { subject: u8, table: u8, bind_base: u8 },
}

impl Instr {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instr::Halt => Opcode::Halt,
            Instr::LoadI { .. } => Opcode::LoadI,
            Instr::LoadS { .. } => Opcode::LoadS,
            Instr::LoadSd { .. } => Opcode::LoadSd,
            Instr::LoadC { .. } => Opcode::LoadC,
            Instr::Add { .. } => Opcode::Add,
            Instr::Sub { .. } => Opcode::Sub,
            Instr::Move { .. } => Opcode::Move,
            Instr::Call { .. } => Opcode::Call,
            Instr::CallCl { .. } => Opcode::CallCl,
            Instr::Ret => Opcode::Ret,
            Instr::MakeCl { .. } => Opcode::MakeCl,
            Instr::Jmp { .. } => Opcode::Jmp,
            Instr::Match { .. } => Opcode::Match,
        }
    }

    /// Packs this instruction into its 32-bit word. Fails if an operand does
    /// not fit its field.
    pub fn encode(&self) -> Result<u32, FaultKind> {
        match *self {
            Instr::Halt => word_ri(Opcode::Halt, 0, 0),
            Instr::LoadI { dst, imm } => word_ri(Opcode::LoadI, dst, imm),
            Instr::LoadS { dst, imm } => word_ri(Opcode::LoadS, dst, imm),
            Instr::LoadSd { dst, imm } => word_ri(Opcode::LoadSd, dst, imm),
            Instr::LoadC { dst, imm } => word_ri(Opcode::LoadC, dst, imm),
            Instr::Add { dst, lhs, rhs } => word_rrr(Opcode::Add, dst, lhs, rhs),
            Instr::Sub { dst, lhs, rhs } => word_rrr(Opcode::Sub, dst, lhs, rhs),
            Instr::Move { dst, src } => word_rrr(Opcode::Move, dst, src, 0),
            Instr::Call { dst, base, argc } => word_rrr(Opcode::Call, dst, base, argc),
            Instr::CallCl { dst, base, argc } => word_rrr(Opcode::CallCl, dst, base, argc),
            Instr::Ret => word_ri(Opcode::Ret, 0, 0),
            Instr::MakeCl { dst, base, capc } => word_rrr(Opcode::MakeCl, dst, base, capc),
            Instr::Jmp { offset } => word_ri(Opcode::Jmp, 0, offset),
            Instr::Match {
                subject,
                table,
                bind_base,
            } => word_rrr(Opcode::Match, subject, table, bind_base),
        }
    }
}

fn check_reg(opcode: Opcode, reg: u8) -> Result<u32, FaultKind> {
    if reg > MAX_REG {
        return Err(FaultKind::EncodingError {
            reason: format!(
                "{}: register operand {} exceeds r{}",
                opcode.mnemonic(),
                reg,
                MAX_REG
            ),
        });
    }
    Ok(u32::from(reg))
}

fn word_ri(opcode: Opcode, r0: u8, imm: u32) -> Result<u32, FaultKind> {
    if imm > MAX_IMM {
        return Err(FaultKind::EncodingError {
            reason: format!(
                "{}: immediate {} exceeds {}",
                opcode.mnemonic(),
                imm,
                MAX_IMM
            ),
        });
    }
    let r0 = check_reg(opcode, r0)?;
    Ok((opcode as u32) << OPCODE_SHIFT | r0 << R0_SHIFT | imm)
}

fn word_rrr(opcode: Opcode, r0: u8, r1: u8, r2: u8) -> Result<u32, FaultKind> {
    let r0 = check_reg(opcode, r0)?;
    let r1 = check_reg(opcode, r1)?;
    let r2 = check_reg(opcode, r2)?;
    Ok((opcode as u32) << OPCODE_SHIFT | r0 << R0_SHIFT | r1 << R1_SHIFT | r2 << R2_SHIFT)
}

/// Unpacks a 32-bit word into its decoded form. The only failure is an
/// opcode outside the enumerated set; operand fields cannot overflow on the
/// way out.
pub fn decode(word: u32) -> Result<Instr, FaultKind> {
    let opcode = Opcode::try_from((word >> OPCODE_SHIFT) as u8)?;
    let r0 = ((word >> R0_SHIFT) & REG_MASK) as u8;
    let r1 = ((word >> R1_SHIFT) & REG_MASK) as u8;
    let r2 = ((word >> R2_SHIFT) & REG_MASK) as u8;
    let imm = word & IMM_MASK;

    Ok(match opcode {
        Opcode::Halt => Instr::Halt,
        Opcode::LoadI => Instr::LoadI { dst: r0, imm },
        Opcode::LoadS => Instr::LoadS { dst: r0, imm },
        Opcode::LoadSd => Instr::LoadSd { dst: r0, imm },
        Opcode::LoadC => Instr::LoadC { dst: r0, imm },
        Opcode::Add => Instr::Add {
            dst: r0,
            lhs: r1,
            rhs: r2,
        },
        Opcode::Sub => Instr::Sub {
            dst: r0,
            lhs: r1,
            rhs: r2,
        },
        Opcode::Move => Instr::Move { dst: r0, src: r1 },
        Opcode::Call => Instr::Call {
            dst: r0,
            base: r1,
            argc: r2,
        },
        Opcode::CallCl => Instr::CallCl {
            dst: r0,
            base: r1,
            argc: r2,
        },
        Opcode::Ret => Instr::Ret,
        Opcode::MakeCl => Instr::MakeCl {
            dst: r0,
            base: r1,
            capc: r2,
        },
        Opcode::Jmp => Instr::Jmp { offset: imm },
        Opcode::Match => Instr::Match {
            subject: r0,
            table: r1,
            bind_base: r2,
        },
    })
}

/// Encodes a whole instruction sequence. This is the constructor surface an
/// external emitter (or a test) uses to build a program buffer.
pub fn assemble(instrs: &[Instr]) -> Result<Vec<u32>, FaultKind> {
    instrs.iter().map(Instr::encode).collect()
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.opcode().mnemonic();
        match *self {
            Instr::Halt | Instr::Ret => write!(f, "{}", m),
            Instr::LoadI { dst, imm }
            | Instr::LoadS { dst, imm }
            | Instr::LoadSd { dst, imm }
            | Instr::LoadC { dst, imm } => write!(f, "{} r{}, {}", m, dst, imm),
            Instr::Add { dst, lhs, rhs } | Instr::Sub { dst, lhs, rhs } => {
                write!(f, "{} r{}, r{}, r{}", m, dst, lhs, rhs)
            }
            Instr::Move { dst, src } => write!(f, "{} r{}, r{}", m, dst, src),
            Instr::Call { dst, base, argc }
            | Instr::CallCl { dst, base, argc } => {
                write!(f, "{} r{}, r{}, {}", m, dst, base, argc)
            }
            Instr::MakeCl { dst, base, capc } => write!(f, "{} r{}, r{}, {}", m, dst, base, capc),
            Instr::Jmp { offset } => write!(f, "{} {}", m, offset),
            Instr::Match {
                subject,
                table,
                bind_base,
            } => write!(f, "{} r{}, r{}, r{}", m, subject, table, bind_base),
        }
    }
}
