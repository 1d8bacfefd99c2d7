//! Typed representation of decoded RV32I instructions.
//!
//! Each instruction family is one variant of [`Instruction`]. Families with
//! several operations carry an operation tag whose discriminant is the
//! `funct3` (or `funct7 << 3 | funct3`) key it is decoded from, so the tags
//! double as the decoder's lookup tables.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::memory::Word;

/// Index of a general purpose register (`0..32`)
pub type Register = u8;

macro_rules! operations {
    (
        $( #[doc = $tdoc:expr] )+
        $ty:ident : $repr:ident {
            $( $( #[doc = $doc:expr] )+ $name:ident = $key:literal => $text:literal , )+
        }
    ) => {
        $( #[doc = $tdoc] )+
        #[repr($repr)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[derive(TryFromPrimitive, IntoPrimitive)]
        pub enum $ty {
            $(
                $( #[doc = $doc] )+
                $name = $key,
            )+
        }

        impl $ty {
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$name => $text , )+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    }
}

operations! {
    /// Major opcodes (bits 0-6)
    Opcode: u8 {
        /// Loads (LB, LH, LW, LBU, LHU)
        Load = 0x03 => "LOAD",
        /// FENCE, FENCE.I
        MiscMem = 0x0F => "MISC-MEM",
        /// Register-immediate arithmetic
        OpImm = 0x13 => "OP-IMM",
        /// Add upper immediate to pc
        Auipc = 0x17 => "AUIPC",
        /// Stores (SB, SH, SW)
        Store = 0x23 => "STORE",
        /// Register-register arithmetic
        Op = 0x33 => "OP",
        /// Load upper immediate
        Lui = 0x37 => "LUI",
        /// Conditional branches
        Branch = 0x63 => "BRANCH",
        /// Jump and link register
        Jalr = 0x67 => "JALR",
        /// Jump and link
        Jal = 0x6F => "JAL",
        /// ECALL, EBREAK, MRET and the CSR instructions
        System = 0x73 => "SYSTEM",
    }
}

operations! {
    /// Register-register operations, keyed by `funct7 << 3 | funct3`
    RegOp: u16 {
        /// Addition
        Add = 0x000 => "ADD",
        /// Shift left logical
        Sll = 0x001 => "SLL",
        /// Set if less than (signed)
        Slt = 0x002 => "SLT",
        /// Set if less than (unsigned)
        Sltu = 0x003 => "SLTU",
        /// Exclusive or
        Xor = 0x004 => "XOR",
        /// Shift right logical
        Srl = 0x005 => "SRL",
        /// Or
        Or = 0x006 => "OR",
        /// And
        And = 0x007 => "AND",
        /// Subtraction
        Sub = 0x100 => "SUB",
        /// Shift right arithmetic
        Sra = 0x105 => "SRA",
    }
}

operations! {
    /// Register-immediate operations, keyed by `funct3`. The shifts also
    /// carry `funct7 << 3` in their key.
    ImmOp: u16 {
        /// Add immediate
        Addi = 0x000 => "ADDI",
        /// Shift left logical by immediate
        Slli = 0x001 => "SLLI",
        /// Set if less than immediate (signed)
        Slti = 0x002 => "SLTI",
        /// Set if less than immediate (unsigned)
        Sltiu = 0x003 => "SLTIU",
        /// Exclusive or immediate
        Xori = 0x004 => "XORI",
        /// Shift right logical by immediate
        Srli = 0x005 => "SRLI",
        /// Or immediate
        Ori = 0x006 => "ORI",
        /// And immediate
        Andi = 0x007 => "ANDI",
        /// Shift right arithmetic by immediate
        Srai = 0x105 => "SRAI",
    }
}

impl ImmOp {
    /// Shifts take a 5 bit shift amount instead of a 12 bit immediate
    pub fn is_shift(&self) -> bool {
        matches!(self, ImmOp::Slli | ImmOp::Srli | ImmOp::Srai)
    }
}

impl From<ImmOp> for RegOp {
    fn from(op: ImmOp) -> Self {
        match op {
            ImmOp::Addi => RegOp::Add,
            ImmOp::Slli => RegOp::Sll,
            ImmOp::Slti => RegOp::Slt,
            ImmOp::Sltiu => RegOp::Sltu,
            ImmOp::Xori => RegOp::Xor,
            ImmOp::Srli => RegOp::Srl,
            ImmOp::Ori => RegOp::Or,
            ImmOp::Andi => RegOp::And,
            ImmOp::Srai => RegOp::Sra,
        }
    }
}

operations! {
    /// Loads, keyed by `funct3`
    LoadOp: u8 {
        /// Load byte, sign extended
        Lb = 0x0 => "LB",
        /// Load halfword, sign extended
        Lh = 0x1 => "LH",
        /// Load word
        Lw = 0x2 => "LW",
        /// Load byte, zero extended
        Lbu = 0x4 => "LBU",
        /// Load halfword, zero extended
        Lhu = 0x5 => "LHU",
    }
}

operations! {
    /// Stores, keyed by `funct3`
    StoreOp: u8 {
        /// Store byte
        Sb = 0x0 => "SB",
        /// Store halfword
        Sh = 0x1 => "SH",
        /// Store word
        Sw = 0x2 => "SW",
    }
}

operations! {
    /// Conditional branches, keyed by `funct3`
    BranchOp: u8 {
        /// Branch if equal
        Beq = 0x0 => "BEQ",
        /// Branch if not equal
        Bne = 0x1 => "BNE",
        /// Branch if less than (signed)
        Blt = 0x4 => "BLT",
        /// Branch if greater or equal (signed)
        Bge = 0x5 => "BGE",
        /// Branch if less than (unsigned)
        Bltu = 0x6 => "BLTU",
        /// Branch if greater or equal (unsigned)
        Bgeu = 0x7 => "BGEU",
    }
}

operations! {
    /// CSR instructions, keyed by `funct3`
    CsrOp: u8 {
        /// Atomic read/write
        Csrrw = 0x1 => "CSRRW",
        /// Atomic read and set bits
        Csrrs = 0x2 => "CSRRS",
        /// Atomic read and clear bits
        Csrrc = 0x3 => "CSRRC",
        /// Atomic read/write with immediate
        Csrrwi = 0x5 => "CSRRWI",
        /// Atomic read and set bits with immediate
        Csrrsi = 0x6 => "CSRRSI",
        /// Atomic read and clear bits with immediate
        Csrrci = 0x7 => "CSRRCI",
    }
}

impl CsrOp {
    /// The source operand is a 5 bit immediate instead of a register
    pub fn is_immediate(&self) -> bool {
        matches!(self, CsrOp::Csrrwi | CsrOp::Csrrsi | CsrOp::Csrrci)
    }
}

/// A decoded instruction
///
/// Immediates are sign extended to 32 bits, except for the upper immediates
/// of LUI and AUIPC which hold the raw 20 bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// R-type arithmetic
    Op {
        op: RegOp,
        rd: Register,
        rs1: Register,
        rs2: Register,
    },
    /// I-type arithmetic. For shifts `imm` is the shift amount.
    OpImm {
        op: ImmOp,
        rd: Register,
        rs1: Register,
        imm: i32,
    },
    Load {
        op: LoadOp,
        rd: Register,
        rs1: Register,
        imm: i32,
    },
    /// `rs2` is stored at `rs1 + imm`
    Store {
        op: StoreOp,
        rs2: Register,
        rs1: Register,
        imm: i32,
    },
    /// `imm` is the even 13 bit branch offset
    Branch {
        op: BranchOp,
        rs1: Register,
        rs2: Register,
        imm: i32,
    },
    Lui {
        rd: Register,
        imm: Word,
    },
    Auipc {
        rd: Register,
        imm: Word,
    },
    /// `imm` is the even 21 bit jump offset
    Jal {
        rd: Register,
        imm: i32,
    },
    Jalr {
        rd: Register,
        rs1: Register,
        imm: i32,
    },
    Fence {
        pred: u8,
        succ: u8,
    },
    FenceI,
    Ecall,
    Ebreak,
    Mret,
    /// `src` is a register index, or the immediate for the `*I` variants
    Csr {
        op: CsrOp,
        rd: Register,
        csr: u16,
        src: u8,
    },
    /// Any encoding which is not part of the supported subset
    Unknown {
        raw: Word,
    },
}

impl Instruction {
    /// Assembler mnemonic of the instruction
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Op { op, .. } => op.name(),
            Instruction::OpImm { op, .. } => op.name(),
            Instruction::Load { op, .. } => op.name(),
            Instruction::Store { op, .. } => op.name(),
            Instruction::Branch { op, .. } => op.name(),
            Instruction::Lui { .. } => "LUI",
            Instruction::Auipc { .. } => "AUIPC",
            Instruction::Jal { .. } => "JAL",
            Instruction::Jalr { .. } => "JALR",
            Instruction::Fence { .. } => "FENCE",
            Instruction::FenceI => "FENCE.I",
            Instruction::Ecall => "ECALL",
            Instruction::Ebreak => "EBREAK",
            Instruction::Mret => "MRET",
            Instruction::Csr { op, .. } => op.name(),
            Instruction::Unknown { .. } => "UNKNOWN",
        }
    }

    /// Branches and jumps set the pc themselves instead of falling through
    pub fn is_control_transfer(&self) -> bool {
        matches!(
            self,
            Instruction::Branch { .. } | Instruction::Jal { .. } | Instruction::Jalr { .. }
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match *self {
            Instruction::Op { rd, rs1, rs2, .. } => {
                write!(f, "{} x{}, x{}, x{}", name, rd, rs1, rs2)
            }
            Instruction::OpImm { rd, rs1, imm, .. } => {
                write!(f, "{} x{}, x{}, {}", name, rd, rs1, imm)
            }
            Instruction::Load { rd, rs1, imm, .. } | Instruction::Jalr { rd, rs1, imm } => {
                write!(f, "{} x{}, {}(x{})", name, rd, imm, rs1)
            }
            Instruction::Store { rs2, rs1, imm, .. } => {
                write!(f, "{} x{}, {}(x{})", name, rs2, imm, rs1)
            }
            Instruction::Branch { rs1, rs2, imm, .. } => {
                write!(f, "{} x{}, x{}, {}", name, rs1, rs2, imm)
            }
            Instruction::Lui { rd, imm } | Instruction::Auipc { rd, imm } => {
                write!(f, "{} x{}, 0x{:x}", name, rd, imm)
            }
            Instruction::Jal { rd, imm } => write!(f, "{} x{}, {}", name, rd, imm),
            Instruction::Fence { pred, succ } => write!(f, "{} 0x{:x}, 0x{:x}", name, pred, succ),
            Instruction::Csr { op, rd, csr, src } if op.is_immediate() => {
                write!(f, "{} x{}, 0x{:03x}, {}", name, rd, csr, src)
            }
            Instruction::Csr { rd, csr, src, .. } => {
                write!(f, "{} x{}, 0x{:03x}, x{}", name, rd, csr, src)
            }
            Instruction::Unknown { raw } => write!(f, "{} (0x{:08x})", name, raw),
            Instruction::FenceI | Instruction::Ecall | Instruction::Ebreak | Instruction::Mret => {
                f.write_str(name)
            }
        }
    }
}
