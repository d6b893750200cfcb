use std::borrow::Cow;
use std::fmt;

use tracing::{info, warn};

use crate::{InstructionList, MethodDefinition, Opcode, ParseError, Replacement, TransformError};

/// An instruction identified by opcode and immediate operand, e.g. `sipush 1500`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstructionTarget {
    pub opcode: Opcode,
    pub operand: i32,
}

impl fmt::Display for InstructionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.opcode, self.operand)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchResult {
    pub applied: bool,
    /// Offsets of every rewritten instruction, in code order.
    pub sites: Vec<usize>,
}

/// Rewrites every `target` instruction in `method` to push the replacement.
///
/// `replacement` is only consulted once a first site has been found, so a bad
/// override never masks a method that lacks the target. More than one site is
/// unexpected and each extra one is warned about; all of them receive the same
/// value. The method body keeps its length, so no branch offsets, exception
/// ranges or stack map frames need adjusting.
pub fn patch<F>(method: &mut MethodDefinition, target: &InstructionTarget, replacement: F) -> Result<PatchResult, TransformError>
where
    F: FnOnce() -> Result<Replacement, TransformError>,
{
    let name = method.name.to_string();
    let code = match method.code_mut() {
        Some(code) => code,
        None => return Ok(PatchResult::default()),
    };

    let mut result = PatchResult::default();
    let (replacement, encoded) = {
        let mut list = InstructionList::decode(&code.code).map_err(|e| err!(e, "method {}", name))?;
        let sites: Vec<usize> = list
            .iter()
            .enumerate()
            .filter(|(_, i)| i.opcode == target.opcode && i.immediate() == Some(target.operand))
            .map(|(ix, _)| ix)
            .collect();
        if sites.is_empty() {
            return Ok(result);
        }

        let replacement = replacement()?;
        if target.opcode.encode_immediate(replacement.value).is_none() {
            return Err(TransformError::OperandOutOfRange {
                value: replacement.value.to_string(),
                origin: replacement.origin,
            });
        }

        for ix in sites {
            let instruction = &mut list.instructions[ix];
            if !result.sites.is_empty() {
                warn!(pc = instruction.pc, "duplicate {} found, previous at pc {:?}", target, result.sites);
            }
            info!(pc = instruction.pc, "located {}", target);
            if !instruction.set_immediate(replacement.value) {
                return Err(TransformError::UnexpectedInternal(format!(
                    "{} at pc {} has a malformed operand",
                    target, instruction.pc
                )));
            }
            result.sites.push(instruction.pc);
        }

        let encoded = list.encode();
        if encoded.len() != code.code.len() {
            return Err(TransformError::UnexpectedInternal(format!(
                "re-encoded method {} is {} bytes, expected {}",
                name,
                encoded.len(),
                code.code.len()
            )));
        }
        (replacement, encoded)
    };
    code.code = Cow::Owned(encoded);
    result.applied = true;
    info!(sites = result.sites.len(), "replaced {} with {} from {}", target, replacement.value, replacement.origin);
    Ok(result)
}
