use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MnemonicFlags: u8 {
const BRANCH = 1 << 0; // final operand is an offset from the end of the instruction
}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mnemonic {
    pub name: &'static str,
    pub opcode: u32,
    pub operands: usize,
    pub flags: MnemonicFlags,
}

impl Mnemonic {
    pub const fn new(name: &'static str, opcode: u32, operands: usize) -> Self {
        Self {
            name,
            opcode,
            operands,
            flags: MnemonicFlags::empty(),
        }
    }

    pub const fn branch(name: &'static str, opcode: u32, operands: usize) -> Self {
        Self {
            name,
            opcode,
            operands,
            flags: MnemonicFlags::BRANCH,
        }
    }

    pub fn uses_relative_last_operand(&self) -> bool {
        self.flags.contains(MnemonicFlags::BRANCH)
    }

    pub fn lookup(name: &str) -> Option<&'static Mnemonic> {
        TABLE.iter().find(|m| m.name == name)
    }
}

const fn op(name: &'static str, opcode: u32, operands: usize) -> Mnemonic {
    Mnemonic::new(name, opcode, operands)
}

const fn br(name: &'static str, opcode: u32, operands: usize) -> Mnemonic {
    Mnemonic::branch(name, opcode, operands)
}

/// Glulx 3.1 instruction set.
pub const TABLE: &[Mnemonic] = &[
    op("nop", 0x00, 0),
    // integer math
    op("add", 0x10, 3),
    op("sub", 0x11, 3),
    op("mul", 0x12, 3),
    op("div", 0x13, 3),
    op("mod", 0x14, 3),
    op("neg", 0x15, 2),
    op("bitand", 0x18, 3),
    op("bitor", 0x19, 3),
    op("bitxor", 0x1A, 3),
    op("bitnot", 0x1B, 2),
    op("shiftl", 0x1C, 3),
    op("sshiftr", 0x1D, 3),
    op("ushiftr", 0x1E, 3),
    // branches
    br("jump", 0x20, 1),
    br("jz", 0x22, 2),
    br("jnz", 0x23, 2),
    br("jeq", 0x24, 3),
    br("jne", 0x25, 3),
    br("jlt", 0x26, 3),
    br("jge", 0x27, 3),
    br("jgt", 0x28, 3),
    br("jle", 0x29, 3),
    br("jltu", 0x2A, 3),
    br("jgeu", 0x2B, 3),
    br("jgtu", 0x2C, 3),
    br("jleu", 0x2D, 3),
    op("jumpabs", 0x104, 1),
    // calls
    op("call", 0x30, 3),
    op("return", 0x31, 1),
    br("catch", 0x32, 2),
    op("throw", 0x33, 2),
    op("tailcall", 0x34, 2),
    op("callf", 0x160, 2),
    op("callfi", 0x161, 3),
    op("callfii", 0x162, 4),
    op("callfiii", 0x163, 5),
    // data movement
    op("copy", 0x40, 2),
    op("copys", 0x41, 2),
    op("copyb", 0x42, 2),
    op("sexs", 0x44, 2),
    op("sexb", 0x45, 2),
    op("aload", 0x48, 3),
    op("aloads", 0x49, 3),
    op("aloadb", 0x4A, 3),
    op("aloadbit", 0x4B, 3),
    op("astore", 0x4C, 3),
    op("astores", 0x4D, 3),
    op("astoreb", 0x4E, 3),
    op("astorebit", 0x4F, 3),
    // stack
    op("stkcount", 0x50, 1),
    op("stkpeek", 0x51, 2),
    op("stkswap", 0x52, 0),
    op("stkroll", 0x53, 2),
    op("stkcopy", 0x54, 1),
    // output
    op("streamchar", 0x70, 1),
    op("streamnum", 0x71, 1),
    op("streamstr", 0x72, 1),
    op("streamunichar", 0x73, 1),
    // system
    op("gestalt", 0x100, 3),
    op("debugtrap", 0x101, 1),
    op("getmemsize", 0x102, 1),
    op("setmemsize", 0x103, 2),
    op("random", 0x110, 2),
    op("setrandom", 0x111, 1),
    op("quit", 0x120, 0),
    op("verify", 0x121, 1),
    op("restart", 0x122, 0),
    op("save", 0x123, 2),
    op("restore", 0x124, 2),
    op("saveundo", 0x125, 1),
    op("restoreundo", 0x126, 1),
    op("protect", 0x127, 2),
    op("glk", 0x130, 3),
    op("getstringtbl", 0x140, 1),
    op("setstringtbl", 0x141, 1),
    op("getiosys", 0x148, 2),
    op("setiosys", 0x149, 2),
    op("linearsearch", 0x150, 8),
    op("binarysearch", 0x151, 8),
    op("linkedsearch", 0x152, 7),
    op("mzero", 0x170, 2),
    op("mcopy", 0x171, 3),
    op("malloc", 0x178, 2),
    op("mfree", 0x179, 1),
    op("accelfunc", 0x180, 2),
    op("accelparam", 0x181, 2),
    // floating point
    op("numtof", 0x190, 2),
    op("ftonumz", 0x191, 2),
    op("ftonumn", 0x192, 2),
    op("ceil", 0x198, 2),
    op("floor", 0x199, 2),
    op("fadd", 0x1A0, 3),
    op("fsub", 0x1A1, 3),
    op("fmul", 0x1A2, 3),
    op("fdiv", 0x1A3, 3),
    op("fmod", 0x1A4, 4),
    op("sqrt", 0x1A8, 2),
    op("exp", 0x1A9, 2),
    op("log", 0x1AA, 2),
    op("pow", 0x1AB, 3),
    op("sin", 0x1B0, 2),
    op("cos", 0x1B1, 2),
    op("tan", 0x1B2, 2),
    op("asin", 0x1B3, 2),
    op("acos", 0x1B4, 2),
    op("atan", 0x1B5, 2),
    op("atan2", 0x1B6, 3),
    br("jfeq", 0x1C0, 4),
    br("jfne", 0x1C1, 4),
    br("jflt", 0x1C2, 3),
    br("jfle", 0x1C3, 3),
    br("jfgt", 0x1C4, 3),
    br("jfge", 0x1C5, 3),
    br("jisnan", 0x1C8, 2),
    br("jisinf", 0x1C9, 2),
];
