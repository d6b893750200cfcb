use std::borrow::Cow;
use std::convert::TryFrom;
use std::fmt;

use crate::{read_bytes, read_u1, read_u4, ParseError};

/// The opcodes the patcher has to tell apart. Everything else is carried as
/// its raw byte.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Opcode {
    Bipush,
    Sipush,
    Other(u8),
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x10 => Opcode::Bipush,
            0x11 => Opcode::Sipush,
            b => Opcode::Other(b),
        }
    }

    pub fn byte(self) -> u8 {
        match self {
            Opcode::Bipush => 0x10,
            Opcode::Sipush => 0x11,
            Opcode::Other(b) => b,
        }
    }

    /// Encodes `value` as this opcode's signed immediate operand, or `None` if
    /// the opcode has no immediate or the value does not fit it.
    pub fn encode_immediate(self, value: i64) -> Option<Vec<u8>> {
        match self {
            Opcode::Bipush => i8::try_from(value).ok().map(|v| v.to_be_bytes().to_vec()),
            Opcode::Sipush => i16::try_from(value).ok().map(|v| v.to_be_bytes().to_vec()),
            Opcode::Other(_) => None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Bipush => write!(f, "bipush"),
            Opcode::Sipush => write!(f, "sipush"),
            Opcode::Other(b) => write!(f, "opcode 0x{:02x}", b),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction<'c> {
    /// Offset of the opcode byte from the start of the method body.
    pub pc: usize,
    pub opcode: Opcode,
    /// Operand bytes exactly as encoded, including switch padding.
    pub operands: Cow<'c, [u8]>,
}

impl<'c> Instruction<'c> {
    /// The signed immediate pushed by `bipush`/`sipush`.
    pub fn immediate(&self) -> Option<i32> {
        match (self.opcode, &self.operands[..]) {
            (Opcode::Bipush, [b]) => Some(*b as i8 as i32),
            (Opcode::Sipush, [hi, lo]) => Some(i16::from_be_bytes([*hi, *lo]) as i32),
            _ => None,
        }
    }

    /// Replaces the immediate operand in place. Fails without modifying
    /// anything if the value does not fit the existing operand width.
    pub fn set_immediate(&mut self, value: i64) -> bool {
        match self.opcode.encode_immediate(value) {
            Some(encoded) if encoded.len() == self.operands.len() => {
                self.operands = Cow::Owned(encoded);
                true
            }
            _ => false,
        }
    }

    pub fn encoded_len(&self) -> usize {
        1 + self.operands.len()
    }
}

// Operand byte count for the instruction whose opcode byte is at `pc`.
fn operand_len(opcode: u8, pc: usize, code: &[u8]) -> Result<usize, ParseError> {
    let len = match opcode {
        0x00..=0x0f => 0,
        0x10 => 1,
        0x11 => 2,
        0x12 => 1,
        0x13 | 0x14 => 2,
        0x15..=0x19 => 1,
        0x1a..=0x35 => 0,
        0x36..=0x3a => 1,
        0x3b..=0x83 => 0,
        0x84 => 2,
        0x85..=0x98 => 0,
        0x99..=0xa8 => 2,
        0xa9 => 1,
        0xaa => {
            // Skip past padding to reach 4-byte alignment
            let mut ix = (pc + 1 + 3) & !0x3;
            let _default = read_u4(code, &mut ix)?;
            let low = read_u4(code, &mut ix)? as i32;
            let high = read_u4(code, &mut ix)? as i32;
            if low > high {
                fail!("The low value must be less than or equal to the high value in tableswitch at index {}", pc);
            }
            let jump_count = match usize::try_from(i64::from(high) - i64::from(low) + 1) {
                Ok(n) => n,
                _ => fail!("Unable to convert range to usize in tableswitch at index {}", pc),
            };
            if jump_count > code.len() {
                fail!("Tableswitch at index {} has {} jumps, more than the method body can hold", pc, jump_count);
            }
            ix - pc - 1 + 4 * jump_count
        }
        0xab => {
            let mut ix = (pc + 1 + 3) & !0x3;
            let _default = read_u4(code, &mut ix)?;
            let npairs = read_u4(code, &mut ix)? as i32;
            let pair_count = match usize::try_from(npairs) {
                Ok(n) => n,
                _ => fail!("Number of pairs in lookupswitch must be non-negative at index {}", pc),
            };
            if pair_count > code.len() {
                fail!("Lookupswitch at index {} has {} pairs, more than the method body can hold", pc, pair_count);
            }
            ix - pc - 1 + 8 * pair_count
        }
        0xac..=0xb1 => 0,
        0xb2..=0xb8 => 2,
        0xb9 | 0xba => 4,
        0xbb => 2,
        0xbc => 1,
        0xbd => 2,
        0xbe | 0xbf => 0,
        0xc0 | 0xc1 => 2,
        0xc2 | 0xc3 => 0,
        0xc4 => {
            // wide modifier
            let mut ix = pc + 1;
            match read_u1(code, &mut ix)? {
                0x15..=0x19 | 0x36..=0x3a | 0xa9 => 3,
                0x84 => 5,
                v => fail!("Unexpected opcode {} inside wide modifier at index {}", v, pc + 1),
            }
        }
        0xc5 => 3,
        0xc6 | 0xc7 => 2,
        0xc8 | 0xc9 => 4,
        0xca | 0xfe | 0xff => 0,
        v => fail!("Unexpected opcode {} at index {}", v, pc),
    };
    Ok(len)
}

/// A decoded method body. Instructions keep their original encoding, so
/// [`encode`](InstructionList::encode) reproduces the input exactly unless an
/// operand was replaced.
#[derive(Clone, Debug, PartialEq)]
pub struct InstructionList<'c> {
    pub instructions: Vec<Instruction<'c>>,
}

impl<'c> InstructionList<'c> {
    pub fn decode(code: &'c [u8]) -> Result<Self, ParseError> {
        let mut instructions = Vec::new();
        let mut ix = 0;
        while ix < code.len() {
            let pc = ix;
            let opcode = read_u1(code, &mut ix)?;
            let len = operand_len(opcode, pc, code)?;
            let operands = read_bytes(code, &mut ix, len).map_err(|e| err!(e, "operands of instruction at index {}", pc))?;
            instructions.push(Instruction {
                pc,
                opcode: Opcode::from_byte(opcode),
                operands: Cow::Borrowed(operands),
            });
        }
        Ok(InstructionList { instructions })
    }

    pub fn encoded_len(&self) -> usize {
        self.instructions.iter().map(Instruction::encoded_len).sum()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut code = Vec::with_capacity(self.encoded_len());
        for instruction in &self.instructions {
            code.push(instruction.opcode.byte());
            code.extend_from_slice(&instruction.operands);
        }
        code
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction<'c>> {
        self.instructions.iter()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
