//! The execution engine: a register machine with one fixed-size register
//! window per call frame. Programs arrive as packed 32-bit words and are
//! decoded once at load; the run loop only ever sees [`Instr`] values.
//!
//! Calling convention: `CALL`/`CALLCL`/`MAKECL` take their operands from the
//! registers immediately after `base` — the callee sees arguments in
//! `r1..=argc`, and for closure calls the captured values follow at
//! `argc+1` onwards. `RET` hands the callee's `r0` back into the caller's
//! destination register.

mod pattern;

use crate::fault::{Fault, FaultKind};
use crate::instr::{self, Instr};
use crate::pool::{ConstantPool, PoolEntry};
use crate::value::{Closure, Value};
use std::rc::Rc;

/// Registers per call frame.
pub const FRAME_REGS: usize = 32;

/// Default limit on live call frames.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

struct Frame {
    regs: [Value; FRAME_REGS],
    /// Where the caller resumes after the callee returns.
    resume_pc: usize,
    /// Caller register that receives the callee's `r0`.
    result_reg: u8,
}

impl Frame {
    fn new(resume_pc: usize, result_reg: u8) -> Self {
        Frame {
            regs: std::array::from_fn(|_| Value::default()),
            resume_pc,
            result_reg,
        }
    }
}

/// A loaded program: decoded instructions plus the parsed constant pool.
/// Loading validates every instruction word and every pool structure, so
/// `run` never re-checks encoding.
#[derive(Debug)]
pub struct Vm {
    code: Vec<Instr>,
    pool: ConstantPool,
    max_depth: usize,
}

impl Vm {
    /// Decodes the program and parses the constant pool. Instruction faults
    /// carry the pc of the offending word; pool faults report pc 0.
    pub fn new(program: &[u32], pool: &[PoolEntry]) -> Result<Self, Fault> {
        let code = program
            .iter()
            .enumerate()
            .map(|(pc, &word)| instr::decode(word).map_err(|kind| Fault::at(pc, kind)))
            .collect::<Result<Vec<_>, _>>()?;
        let pool = ConstantPool::parse(pool).map_err(|kind| Fault::at(0, kind))?;
        Ok(Vm {
            code,
            pool,
            max_depth: DEFAULT_MAX_DEPTH,
        })
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Runs the program from pc 0 in a fresh outermost frame until `HALT`
    /// or a fault. The result is whatever `r0` of the outermost frame holds
    /// when the machine halts.
    pub fn run(&self) -> Result<Value, Fault> {
        let mut frames = vec![Frame::new(0, 0)];
        let mut pc = 0usize;

        loop {
            let instr = *self
                .code
                .get(pc)
                .ok_or_else(|| Fault::at(pc, self.end_of_program(pc)))?;

            // The current frame is re-borrowed per step; call and return
            // shuffle the frame stack underneath us. The stack is never
            // empty: it starts with one frame and RET refuses to pop it.
            let top = frames.len() - 1;
            let frame = &mut frames[top];

            match instr {
                Instr::Halt => {
                    return Ok(frames[0].regs[0].clone());
                }

                Instr::LoadI { dst, imm } => {
                    frame.regs[dst as usize] = Value::Number(i64::from(imm));
                    pc += 1;
                }
                Instr::LoadS { dst, imm } => {
                    frame.regs[dst as usize] = Value::Symbol(imm);
                    pc += 1;
                }
                Instr::LoadSd { dst, imm } => {
                    let value = self
                        .pool
                        .data_symbol(imm as usize)
                        .map_err(|kind| Fault::at(pc, kind))?;
                    frame.regs[dst as usize] = value;
                    pc += 1;
                }
                Instr::LoadC { dst, imm } => {
                    let value = self
                        .pool
                        .scalar(imm as usize)
                        .map_err(|kind| Fault::at(pc, kind))?;
                    frame.regs[dst as usize] = value;
                    pc += 1;
                }

                Instr::Add { dst, lhs, rhs } => {
                    let (a, b) = Self::arith_operands(frame, "ADD", lhs, rhs)
                        .map_err(|kind| Fault::at(pc, kind))?;
                    frame.regs[dst as usize] = Value::Number(a.wrapping_add(b));
                    pc += 1;
                }
                Instr::Sub { dst, lhs, rhs } => {
                    let (a, b) = Self::arith_operands(frame, "SUB", lhs, rhs)
                        .map_err(|kind| Fault::at(pc, kind))?;
                    frame.regs[dst as usize] = Value::Number(a.wrapping_sub(b));
                    pc += 1;
                }
                Instr::Move { dst, src } => {
                    frame.regs[dst as usize] = frame.regs[src as usize].clone();
                    pc += 1;
                }

                Instr::Call { dst, base, argc } => {
                    let entry = self
                        .code_address("CALL", &frame.regs[base as usize])
                        .map_err(|kind| Fault::at(pc, kind))?;
                    let mut callee = Frame::new(pc + 1, dst);
                    Self::copy_args(frame, &mut callee, base, argc, 0)
                        .map_err(|kind| Fault::at(pc, kind))?;
                    self.push_frame(&mut frames, callee)
                        .map_err(|kind| Fault::at(pc, kind))?;
                    pc = entry;
                }
                Instr::CallCl { dst, base, argc } => {
                    let closure = frame.regs[base as usize]
                        .closure()
                        .cloned()
                        .ok_or_else(|| {
                            Fault::at(
                                pc,
                                FaultKind::TypeError {
                                    op: "CALLCL",
                                    expected: "closure",
                                    actual: frame.regs[base as usize].type_name(),
                                },
                            )
                        })?;
                    let mut callee = Frame::new(pc + 1, dst);
                    Self::copy_args(frame, &mut callee, base, argc, closure.captured.len())
                        .map_err(|kind| Fault::at(pc, kind))?;
                    for (i, captured) in closure.captured.iter().enumerate() {
                        callee.regs[argc as usize + 1 + i] = captured.clone();
                    }
                    self.push_frame(&mut frames, callee)
                        .map_err(|kind| Fault::at(pc, kind))?;
                    pc = closure.entry;
                }
                Instr::Ret => {
                    if frames.len() == 1 {
                        return Err(Fault::at(pc, FaultKind::StackUnderflow));
                    }
                    if let Some(callee) = frames.pop() {
                        if let Some(caller) = frames.last_mut() {
                            caller.regs[callee.result_reg as usize] = callee.regs[0].clone();
                        }
                        pc = callee.resume_pc;
                    }
                }

                Instr::MakeCl { dst, base, capc } => {
                    let entry = self
                        .code_address("MAKECL", &frame.regs[base as usize])
                        .map_err(|kind| Fault::at(pc, kind))?;
                    let mut captured = Vec::with_capacity(capc as usize);
                    for i in 1..=capc as usize {
                        captured.push(Self::reg(frame, base as usize + i, pc)?.clone());
                    }
                    frame.regs[dst as usize] = Value::Closure(Rc::new(Closure { entry, captured }));
                    pc += 1;
                }

                Instr::Jmp { offset } => {
                    pc = pc + 1 + offset as usize;
                }

                Instr::Match {
                    subject,
                    table,
                    bind_base,
                } => {
                    let table_index = frame.regs[table as usize]
                        .number()
                        .and_then(|n| usize::try_from(n).ok())
                        .ok_or_else(|| {
                            Fault::at(
                                pc,
                                FaultKind::TypeError {
                                    op: "MATCH",
                                    expected: "number",
                                    actual: frame.regs[table as usize].type_name(),
                                },
                            )
                        })?;
                    let table = self.pool.table(table_index).ok_or_else(|| {
                        Fault::at(
                            pc,
                            FaultKind::BadConstant {
                                index: table_index,
                                reason: "no pattern table at this index",
                            },
                        )
                    })?;
                    let subject = &frame.regs[subject as usize];
                    let (case, bindings) = pattern::dispatch(table, subject).ok_or_else(|| {
                        Fault::at(pc, FaultKind::NoMatchingCase { table: table_index })
                    })?;
                    for (slot, value) in bindings {
                        let reg = bind_base as usize + slot;
                        *Self::reg_mut(frame, reg, pc)? = value;
                    }
                    // Branch into the jump slot for the winning case.
                    pc = pc + 1 + case;
                }
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn end_of_program(&self, pc: usize) -> FaultKind {
        FaultKind::IndexOutOfRange {
            what: "program",
            index: pc,
            len: self.code.len(),
        }
    }

    /// Both arithmetic operands, or a type fault naming the first offender.
    fn arith_operands(
        frame: &Frame,
        op: &'static str,
        lhs: u8,
        rhs: u8,
    ) -> Result<(i64, i64), FaultKind> {
        let take = |reg: u8| {
            frame.regs[reg as usize]
                .number()
                .ok_or_else(|| FaultKind::TypeError {
                    op,
                    expected: "number",
                    actual: frame.regs[reg as usize].type_name(),
                })
        };
        Ok((take(lhs)?, take(rhs)?))
    }

    /// A code entry address held in a register: a non-negative number that
    /// points inside the program.
    fn code_address(&self, op: &'static str, value: &Value) -> Result<usize, FaultKind> {
        let n = value.number().ok_or_else(|| FaultKind::TypeError {
            op,
            expected: "number",
            actual: value.type_name(),
        })?;
        usize::try_from(n)
            .ok()
            .filter(|&entry| entry < self.code.len())
            .ok_or_else(|| FaultKind::IndexOutOfRange {
                what: "program",
                index: n.max(0) as usize,
                len: self.code.len(),
            })
    }

    /// Copies `argc` arguments from the caller's `base+1..` into the
    /// callee's `r1..`. `extra` reserves room after the arguments (closure
    /// captures) so overlong argument lists fault instead of clipping them.
    fn copy_args(
        caller: &Frame,
        callee: &mut Frame,
        base: u8,
        argc: u8,
        extra: usize,
    ) -> Result<(), FaultKind> {
        if argc as usize + extra >= FRAME_REGS {
            return Err(FaultKind::IndexOutOfRange {
                what: "registers",
                index: argc as usize + extra,
                len: FRAME_REGS,
            });
        }
        for i in 1..=argc as usize {
            let src = base as usize + i;
            if src >= FRAME_REGS {
                return Err(FaultKind::IndexOutOfRange {
                    what: "registers",
                    index: src,
                    len: FRAME_REGS,
                });
            }
            callee.regs[i] = caller.regs[src].clone();
        }
        Ok(())
    }

    fn push_frame(&self, frames: &mut Vec<Frame>, frame: Frame) -> Result<(), FaultKind> {
        if frames.len() >= self.max_depth {
            return Err(FaultKind::StackOverflow {
                limit: self.max_depth,
            });
        }
        frames.push(frame);
        Ok(())
    }

    fn reg(frame: &Frame, index: usize, pc: usize) -> Result<&Value, Fault> {
        frame
            .regs
            .get(index)
            .ok_or_else(|| Fault::at(pc, reg_out_of_range(index)))
    }

    fn reg_mut(frame: &mut Frame, index: usize, pc: usize) -> Result<&mut Value, Fault> {
        frame
            .regs
            .get_mut(index)
            .ok_or_else(|| Fault::at(pc, reg_out_of_range(index)))
    }
}

fn reg_out_of_range(index: usize) -> FaultKind {
    FaultKind::IndexOutOfRange {
        what: "registers",
        index,
        len: FRAME_REGS,
    }
}

/// Loads and runs a program in one step.
pub fn execute(program: &[u32], pool: &[PoolEntry]) -> Result<Value, Fault> {
    Vm::new(program, pool)?.run()
}
