use std::fmt;

use crate::memory::{Memory, Word, MEMORY_SIZE};
use crate::program::Program;
use color_eyre::eyre::{bail, Result, WrapErr};
use log::*;

pub mod decode;
pub mod instruction;

pub use decode::decode;
pub use instruction::Instruction;
use instruction::{BranchOp, CsrOp, LoadOp, RegOp, Register, StoreOp};

/// Number of general purpose registers
pub const REGISTERS: usize = 32;

/// Width of every instruction in bytes
pub const INSTRUCTION_WIDTH: Word = 4;

/// Number of memory bytes reported once a program halts
const MEMORY_REPORT: usize = 32;

/// Processor with the default memory size
pub type StdProcessor = Processor<MEMORY_SIZE>;

/// State of the fetch-decode-execute loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// An instruction was executed and the next one may be fetched
    Running,
    /// No instruction is mapped at the program counter
    Halted,
}

/// Emulates an RV32I hart: register file, program counter and data memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Processor<const S: usize> {
    /// Program counter
    pub pc: Word,
    /// General purpose registers. `x0` is re-zeroed after every instruction
    pub registers: [Word; REGISTERS],
    /// Flat data memory
    pub memory: Memory<S>,
}

impl<const S: usize> Default for Processor<S> {
    /// Initializes a new CPU
    fn default() -> Self {
        Self::new(0x0000)
    }
}

impl RegOp {
    fn apply(self, a: Word, b: Word) -> Word {
        let shamt = b & 0x1F;
        match self {
            RegOp::Add => a.wrapping_add(b),
            RegOp::Sub => a.wrapping_sub(b),
            RegOp::Sll => a << shamt,
            RegOp::Slt => ((a as i32) < (b as i32)) as Word,
            RegOp::Sltu => (a < b) as Word,
            RegOp::Xor => a ^ b,
            RegOp::Srl => a >> shamt,
            RegOp::Sra => ((a as i32) >> shamt) as Word,
            RegOp::Or => a | b,
            RegOp::And => a & b,
        }
    }
}

impl BranchOp {
    fn taken(self, a: Word, b: Word) -> bool {
        match self {
            BranchOp::Beq => a == b,
            BranchOp::Bne => a != b,
            BranchOp::Blt => (a as i32) < (b as i32),
            BranchOp::Bge => (a as i32) >= (b as i32),
            BranchOp::Bltu => a < b,
            BranchOp::Bgeu => a >= b,
        }
    }
}

impl<const S: usize> Processor<S> {
    /// Initializes a new CPU
    /// @param entrypoint The address of the first instruction
    pub fn new(entrypoint: Word) -> Self {
        Self {
            pc: entrypoint,
            registers: [0; REGISTERS],
            memory: Memory::default(),
        }
    }

    /// Reads a register. `x0` always reads as zero.
    pub fn read_register(&self, index: Register) -> Word {
        match index {
            0 => 0,
            _ => self.registers[index as usize],
        }
    }

    fn write_register(&mut self, index: Register, value: Word) {
        self.registers[index as usize] = value;
    }

    /// Executes a single decoded instruction, including the program counter
    /// update.
    ///
    /// # Errors
    ///
    /// Fails if a load or store leaves the memory. The program counter is not
    /// advanced in that case.
    pub fn execute_instruction(&mut self, instruction: Instruction) -> Result<()> {
        match instruction {
            Instruction::Op { op, rd, rs1, rs2 } => {
                let result = op.apply(self.read_register(rs1), self.read_register(rs2));
                self.write_register(rd, result);
            }
            Instruction::OpImm { op, rd, rs1, imm } => {
                let result = RegOp::from(op).apply(self.read_register(rs1), imm as Word);
                self.write_register(rd, result);
            }
            Instruction::Load { op, rd, rs1, imm } => {
                let address = self.read_register(rs1).wrapping_add(imm as Word);
                let value = match op {
                    LoadOp::Lb => self.memory.read_byte(address)? as i8 as i32 as Word,
                    LoadOp::Lh => self.memory.read_half(address)? as i16 as i32 as Word,
                    LoadOp::Lw => self.memory.read_word(address)?,
                    LoadOp::Lbu => self.memory.read_byte(address)? as Word,
                    LoadOp::Lhu => self.memory.read_half(address)? as Word,
                };
                self.write_register(rd, value);

                trace!("{} 0x{:08x}: 0x{:08x}", op, address, value);
            }
            Instruction::Store { op, rs2, rs1, imm } => {
                let address = self.read_register(rs1).wrapping_add(imm as Word);
                let value = self.read_register(rs2);
                match op {
                    StoreOp::Sb => self.memory.write_byte(address, value as u8)?,
                    StoreOp::Sh => self.memory.write_half(address, value as u16)?,
                    StoreOp::Sw => self.memory.write_word(address, value)?,
                }

                trace!("{} 0x{:08x}: 0x{:08x}", op, address, value);
            }
            Instruction::Branch { op, rs1, rs2, imm } => {
                if op.taken(self.read_register(rs1), self.read_register(rs2)) {
                    self.pc = self.pc.wrapping_add(imm as Word);
                } else {
                    self.pc = self.pc.wrapping_add(INSTRUCTION_WIDTH);
                }
            }
            Instruction::Lui { rd, imm } => {
                self.write_register(rd, imm << 12);
            }
            Instruction::Auipc { rd, imm } => {
                self.write_register(rd, self.pc.wrapping_add(imm << 12));
            }
            Instruction::Jal { rd, imm } => {
                self.write_register(rd, self.pc.wrapping_add(INSTRUCTION_WIDTH));
                self.pc = self.pc.wrapping_add(imm as Word);
            }
            Instruction::Jalr { rd, rs1, imm } => {
                // the target has to be computed before rd is written, rd may be rs1
                let target = self.read_register(rs1).wrapping_add(imm as Word) & !1;
                self.write_register(rd, self.pc.wrapping_add(INSTRUCTION_WIDTH));
                self.pc = target;
            }
            Instruction::Fence { .. }
            | Instruction::FenceI
            | Instruction::Ecall
            | Instruction::Ebreak
            | Instruction::Mret => {}
            // There is no CSR file: CSRRS reads as zero, everything else is ignored
            Instruction::Csr { op, rd, .. } => {
                if op == CsrOp::Csrrs {
                    self.write_register(rd, 0);
                }
            }
            Instruction::Unknown { .. } => {
                warn!("Unsupported instruction: {}", instruction);
            }
        }

        if !instruction.is_control_transfer() {
            self.pc = self.pc.wrapping_add(INSTRUCTION_WIDTH);
        }

        self.registers[0] = 0;

        debug!("{}", instruction);

        Ok(())
    }

    /// Runs one fetch-decode-execute step
    pub fn step(&mut self, program: &Program) -> Result<Status> {
        let pc = self.pc;
        let word = match program.fetch(pc) {
            Some(word) => word,
            None => {
                debug!("No instruction at 0x{:08x}", pc);
                return Ok(Status::Halted);
            }
        };

        let instruction = decode(word);
        info!(
            "PC: 0x{:08x}, Instruction: {} (0x{:08x})",
            pc, instruction, word
        );

        self.execute_instruction(instruction)
            .wrap_err_with(|| format!("Failed to execute `{}` at 0x{:08x}", instruction, pc))?;

        for row in self.to_string().lines() {
            info!("{}", row);
        }

        Ok(Status::Running)
    }

    /// Run program until no instruction is mapped at the program counter.
    /// Returns the number of executed instructions.
    ///
    /// # Errors
    ///
    /// Fails on the first memory fault, or when `max_steps` instructions were
    /// executed and another one is mapped at the program counter. The limit is
    /// checked before every step, so no more than `max_steps` instructions run.
    pub fn execute_until_halt(
        &mut self,
        program: &Program,
        max_steps: Option<usize>,
    ) -> Result<usize> {
        let mut steps = 0;

        loop {
            if let Some(limit) = max_steps {
                if steps >= limit && program.fetch(self.pc).is_some() {
                    bail!(
                        "Step limit of {} reached at 0x{:08x} without halting",
                        limit,
                        self.pc
                    );
                }
            }

            if self.step(program)? == Status::Halted {
                break;
            }
            steps += 1;
        }

        info!(
            "Program halted after {} step(s) at 0x{:08x}",
            steps, self.pc
        );
        info!("Memory: {:02x?}", self.memory.head(MEMORY_REPORT));

        Ok(steps)
    }
}

impl<const S: usize> fmt::Display for Processor<S> {
    /// Formats the register file as four rows of eight registers
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, registers) in self.registers.chunks(8).enumerate() {
            if row > 0 {
                writeln!(f)?;
            }
            for (column, value) in registers.iter().enumerate() {
                if column > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "x{:2}:{:08x}", row * 8 + column, value)?;
            }
        }

        Ok(())
    }
}
