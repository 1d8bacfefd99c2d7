//! Decoding of raw 32-bit instruction words.
//!
//! Decoding never fails: any word outside of the supported subset becomes an
//! [`Instruction::Unknown`] which keeps the raw word for diagnostics.

use std::convert::TryFrom;

use crate::memory::Word;

use super::instruction::{
    BranchOp, CsrOp, ImmOp, Instruction, LoadOp, Opcode, RegOp, Register, StoreOp,
};

const ECALL: Word = 0x000;
const EBREAK: Word = 0x001;
const MRET: Word = 0x302;

const FENCE: Word = 0x0;
const FENCE_I: Word = 0x1;

/// Extracts bits `hi..=lo` of `word`
fn bits(word: Word, hi: u32, lo: u32) -> Word {
    (word >> lo) & ((1 << (hi - lo + 1)) - 1)
}

/// Sign extends the low `width` bits of `value`
fn sign_extend(value: Word, width: u32) -> i32 {
    let shift = 32 - width;
    ((value << shift) as i32) >> shift
}

fn rd(word: Word) -> Register {
    bits(word, 11, 7) as Register
}

fn rs1(word: Word) -> Register {
    bits(word, 19, 15) as Register
}

fn rs2(word: Word) -> Register {
    bits(word, 24, 20) as Register
}

fn funct3(word: Word) -> Word {
    bits(word, 14, 12)
}

fn funct7(word: Word) -> Word {
    bits(word, 31, 25)
}

/// `imm[11:0]` from bits 31-20
fn i_imm(word: Word) -> i32 {
    (word as i32) >> 20
}

/// `imm[11:5]` from bits 31-25, `imm[4:0]` from bits 11-7
fn s_imm(word: Word) -> i32 {
    sign_extend(bits(word, 31, 25) << 5 | bits(word, 11, 7), 12)
}

/// `imm[12|10:5]` from bits 31-25, `imm[4:1|11]` from bits 11-7
fn b_imm(word: Word) -> i32 {
    let imm = bits(word, 31, 31) << 12
        | bits(word, 7, 7) << 11
        | bits(word, 30, 25) << 5
        | bits(word, 11, 8) << 1;
    sign_extend(imm, 13)
}

/// `imm[31:12]`, left in place for the execution stage to shift
fn u_imm(word: Word) -> Word {
    word >> 12
}

/// `imm[20|10:1|11|19:12]` from bits 31-12
fn j_imm(word: Word) -> i32 {
    let imm = bits(word, 31, 31) << 20
        | bits(word, 19, 12) << 12
        | bits(word, 20, 20) << 11
        | bits(word, 30, 21) << 1;
    sign_extend(imm, 21)
}

/// Decodes a raw instruction word
pub fn decode(word: Word) -> Instruction {
    let opcode = match Opcode::try_from(bits(word, 6, 0) as u8) {
        Ok(opcode) => opcode,
        Err(_) => return Instruction::Unknown { raw: word },
    };

    let instruction = match opcode {
        Opcode::Op => decode_op(word),
        Opcode::OpImm => decode_op_imm(word),
        Opcode::Load => decode_load(word),
        Opcode::Store => decode_store(word),
        Opcode::Branch => decode_branch(word),
        Opcode::Lui => Some(Instruction::Lui {
            rd: rd(word),
            imm: u_imm(word),
        }),
        Opcode::Auipc => Some(Instruction::Auipc {
            rd: rd(word),
            imm: u_imm(word),
        }),
        Opcode::Jal => Some(Instruction::Jal {
            rd: rd(word),
            imm: j_imm(word),
        }),
        Opcode::Jalr => decode_jalr(word),
        Opcode::MiscMem => decode_misc_mem(word),
        Opcode::System => decode_system(word),
    };

    instruction.unwrap_or(Instruction::Unknown { raw: word })
}

fn decode_op(word: Word) -> Option<Instruction> {
    let key = funct7(word) << 3 | funct3(word);
    let op = RegOp::try_from(key as u16).ok()?;

    Some(Instruction::Op {
        op,
        rd: rd(word),
        rs1: rs1(word),
        rs2: rs2(word),
    })
}

fn decode_op_imm(word: Word) -> Option<Instruction> {
    let funct3 = funct3(word);
    // only the shifts use the upper immediate bits as funct7
    let key = match funct3 {
        0x1 | 0x5 => funct7(word) << 3 | funct3,
        _ => funct3,
    };
    let op = ImmOp::try_from(key as u16).ok()?;

    let imm = if op.is_shift() {
        bits(word, 24, 20) as i32
    } else {
        i_imm(word)
    };

    Some(Instruction::OpImm {
        op,
        rd: rd(word),
        rs1: rs1(word),
        imm,
    })
}

fn decode_load(word: Word) -> Option<Instruction> {
    let op = LoadOp::try_from(funct3(word) as u8).ok()?;

    Some(Instruction::Load {
        op,
        rd: rd(word),
        rs1: rs1(word),
        imm: i_imm(word),
    })
}

fn decode_store(word: Word) -> Option<Instruction> {
    let op = StoreOp::try_from(funct3(word) as u8).ok()?;

    Some(Instruction::Store {
        op,
        rs2: rs2(word),
        rs1: rs1(word),
        imm: s_imm(word),
    })
}

fn decode_branch(word: Word) -> Option<Instruction> {
    let op = BranchOp::try_from(funct3(word) as u8).ok()?;

    Some(Instruction::Branch {
        op,
        rs1: rs1(word),
        rs2: rs2(word),
        imm: b_imm(word),
    })
}

fn decode_jalr(word: Word) -> Option<Instruction> {
    if funct3(word) != 0 {
        return None;
    }

    Some(Instruction::Jalr {
        rd: rd(word),
        rs1: rs1(word),
        imm: i_imm(word),
    })
}

fn decode_misc_mem(word: Word) -> Option<Instruction> {
    match funct3(word) {
        FENCE => Some(Instruction::Fence {
            pred: bits(word, 27, 24) as u8,
            succ: bits(word, 23, 20) as u8,
        }),
        FENCE_I => Some(Instruction::FenceI),
        _ => None,
    }
}

fn decode_system(word: Word) -> Option<Instruction> {
    let funct3 = funct3(word);
    let imm = bits(word, 31, 20);

    match (funct3, imm) {
        (0, ECALL) => Some(Instruction::Ecall),
        (0, EBREAK) => Some(Instruction::Ebreak),
        (0, MRET) => Some(Instruction::Mret),
        _ => {
            let op = CsrOp::try_from(funct3 as u8).ok()?;

            Some(Instruction::Csr {
                op,
                rd: rd(word),
                csr: imm as u16,
                src: rs1(word),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test-only encoders, one per instruction format

    fn encode_r(op: RegOp, rd: Register, rs1: Register, rs2: Register) -> Word {
        let key = u16::from(op) as Word;
        (key >> 3) << 25
            | (rs2 as Word) << 20
            | (rs1 as Word) << 15
            | (key & 0x7) << 12
            | (rd as Word) << 7
            | 0x33
    }

    fn encode_i(funct3: Word, rd: Register, rs1: Register, imm: i32, opcode: Word) -> Word {
        ((imm as Word) & 0xFFF) << 20
            | (rs1 as Word) << 15
            | funct3 << 12
            | (rd as Word) << 7
            | opcode
    }

    fn encode_op_imm(op: ImmOp, rd: Register, rs1: Register, imm: i32) -> Word {
        let key = u16::from(op) as Word;
        let imm = if op.is_shift() {
            ((key >> 3) << 5 | (imm as Word & 0x1F)) as i32
        } else {
            imm
        };
        encode_i(key & 0x7, rd, rs1, imm, 0x13)
    }

    fn encode_s(op: StoreOp, rs2: Register, rs1: Register, imm: i32) -> Word {
        let imm = imm as Word;
        ((imm >> 5) & 0x7F) << 25
            | (rs2 as Word) << 20
            | (rs1 as Word) << 15
            | (u8::from(op) as Word) << 12
            | (imm & 0x1F) << 7
            | 0x23
    }

    fn encode_b(op: BranchOp, rs1: Register, rs2: Register, imm: i32) -> Word {
        let imm = imm as Word;
        ((imm >> 12) & 0x1) << 31
            | ((imm >> 5) & 0x3F) << 25
            | (rs2 as Word) << 20
            | (rs1 as Word) << 15
            | (u8::from(op) as Word) << 12
            | ((imm >> 1) & 0xF) << 8
            | ((imm >> 11) & 0x1) << 7
            | 0x63
    }

    fn encode_u(rd: Register, imm: Word, opcode: Word) -> Word {
        imm << 12 | (rd as Word) << 7 | opcode
    }

    fn encode_j(rd: Register, imm: i32) -> Word {
        let imm = imm as Word;
        ((imm >> 20) & 0x1) << 31
            | ((imm >> 1) & 0x3FF) << 21
            | ((imm >> 11) & 0x1) << 20
            | ((imm >> 12) & 0xFF) << 12
            | (rd as Word) << 7
            | 0x6F
    }

    #[test]
    fn test_known_words() {
        // addi x1, x0, 5
        assert_eq!(
            decode(0x0050_0093),
            Instruction::OpImm {
                op: ImmOp::Addi,
                rd: 1,
                rs1: 0,
                imm: 5
            }
        );
        // add x3, x1, x2
        assert_eq!(
            decode(0x0020_81B3),
            Instruction::Op {
                op: RegOp::Add,
                rd: 3,
                rs1: 1,
                rs2: 2
            }
        );
        // sub x5, x6, x7
        assert_eq!(
            decode(0x4073_02B3),
            Instruction::Op {
                op: RegOp::Sub,
                rd: 5,
                rs1: 6,
                rs2: 7
            }
        );
        // lw x10, -4(x2)
        assert_eq!(
            decode(0xFFC1_2503),
            Instruction::Load {
                op: LoadOp::Lw,
                rd: 10,
                rs1: 2,
                imm: -4
            }
        );
        // jalr x0, 0(x1)
        assert_eq!(
            decode(0x0000_8067),
            Instruction::Jalr {
                rd: 0,
                rs1: 1,
                imm: 0
            }
        );
        // lui x5, 0x80000
        assert_eq!(decode(0x8000_02B7), Instruction::Lui { rd: 5, imm: 0x80000 });
    }

    #[test]
    fn test_register_round_trip() {
        for &op in RegOp::ALL {
            let word = encode_r(op, 31, 1, 17);
            assert_eq!(
                decode(word),
                Instruction::Op {
                    op,
                    rd: 31,
                    rs1: 1,
                    rs2: 17
                },
                "{}",
                op
            );
        }
    }

    #[test]
    fn test_immediate_round_trip() {
        for &op in ImmOp::ALL {
            let imm = if op.is_shift() { 31 } else { -1234 };
            let word = encode_op_imm(op, 4, 9, imm);
            assert_eq!(
                decode(word),
                Instruction::OpImm {
                    op,
                    rd: 4,
                    rs1: 9,
                    imm
                },
                "{}",
                op
            );
        }

        for &op in LoadOp::ALL {
            let word = encode_i(u8::from(op) as Word, 6, 2, 2047, 0x03);
            assert_eq!(
                decode(word),
                Instruction::Load {
                    op,
                    rd: 6,
                    rs1: 2,
                    imm: 2047
                }
            );
        }
    }

    #[test]
    fn test_store_round_trip() {
        for &op in StoreOp::ALL {
            for &imm in &[-2048, -1, 0, 33, 2047] {
                let word = encode_s(op, 12, 13, imm);
                assert_eq!(
                    decode(word),
                    Instruction::Store {
                        op,
                        rs2: 12,
                        rs1: 13,
                        imm
                    }
                );
            }
        }
    }

    #[test]
    fn test_branch_round_trip() {
        for &op in BranchOp::ALL {
            for &imm in &[-4096, -2, 8, 2048, 4094] {
                let word = encode_b(op, 3, 4, imm);
                assert_eq!(
                    decode(word),
                    Instruction::Branch {
                        op,
                        rs1: 3,
                        rs2: 4,
                        imm
                    }
                );
            }
        }
    }

    #[test]
    fn test_upper_round_trip() {
        assert_eq!(
            decode(encode_u(7, 0xFFFFF, 0x37)),
            Instruction::Lui { rd: 7, imm: 0xFFFFF }
        );
        assert_eq!(
            decode(encode_u(8, 0x12345, 0x17)),
            Instruction::Auipc { rd: 8, imm: 0x12345 }
        );
    }

    #[test]
    fn test_jump_round_trip() {
        for &imm in &[-1_048_576, -2, 0, 2048, 1_048_574] {
            assert_eq!(decode(encode_j(1, imm)), Instruction::Jal { rd: 1, imm });
        }
    }

    #[test]
    fn test_i_immediate_sign_boundary() {
        let word = encode_i(0, 1, 0, 0x800, 0x13);
        assert_eq!(
            decode(word),
            Instruction::OpImm {
                op: ImmOp::Addi,
                rd: 1,
                rs1: 0,
                imm: -2048
            }
        );

        let word = encode_i(0, 1, 0, 0x7FF, 0x13);
        assert_eq!(
            decode(word),
            Instruction::OpImm {
                op: ImmOp::Addi,
                rd: 1,
                rs1: 0,
                imm: 2047
            }
        );
    }

    #[test]
    fn test_system() {
        assert_eq!(decode(0x0000_0073), Instruction::Ecall);
        assert_eq!(decode(0x0010_0073), Instruction::Ebreak);
        assert_eq!(decode(0x3020_0073), Instruction::Mret);
        // csrrs x5, mstatus, x0
        assert_eq!(
            decode(0x3000_22F3),
            Instruction::Csr {
                op: CsrOp::Csrrs,
                rd: 5,
                csr: 0x300,
                src: 0
            }
        );
        // csrrwi x0, mtvec, 7
        assert_eq!(
            decode(0x3053_D073),
            Instruction::Csr {
                op: CsrOp::Csrrwi,
                rd: 0,
                csr: 0x305,
                src: 7
            }
        );
        // wfi is not part of the subset
        assert_eq!(decode(0x1050_0073), Instruction::Unknown { raw: 0x1050_0073 });
        // funct3 = 4 is reserved
        assert_eq!(decode(0x3000_4073), Instruction::Unknown { raw: 0x3000_4073 });
    }

    #[test]
    fn test_fence() {
        // fence iorw, iorw
        assert_eq!(
            decode(0x0FF0_000F),
            Instruction::Fence {
                pred: 0xF,
                succ: 0xF
            }
        );
        assert_eq!(decode(0x0000_100F), Instruction::FenceI);
        assert_eq!(decode(0x0000_200F), Instruction::Unknown { raw: 0x0000_200F });
    }

    #[test]
    fn test_unknown() {
        for &word in &[
            0xFFFF_FFFF,
            0x0000_0000,
            // sll with funct7 = 0x20
            0x4020_91B3,
            // slli with funct7 = 0x20
            0x4020_9093,
            // load with funct3 = 3 (ld)
            0x0000_3003,
            // store with funct3 = 3 (sd)
            0x0000_3023,
            // branch with funct3 = 2
            0x0000_2063,
            // jalr with funct3 = 1
            0x0000_1067,
        ] {
            assert_eq!(decode(word), Instruction::Unknown { raw: word }, "0x{:08x}", word);
        }
    }
}
