//! Functional simulator for the RV32I base integer instruction set.
//!
//! Programs are loaded from objdump disassembly listings (or the hex pairs
//! derived from them) into a [`Program`](program::Program) and executed one
//! instruction at a time by a [`Processor`](processor::Processor) until no
//! instruction is mapped at the program counter.

pub mod hex;
pub mod memory;
pub mod processor;
pub mod program;
