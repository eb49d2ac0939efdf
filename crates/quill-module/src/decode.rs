//! Decompiler: raw bytes to [`ModuleDescription`]
//!
//! A pure structural parse. Nothing here judges whether the module is safe
//! to run; that is the validator's job.

use crate::error::{DecodeError, DecodeResult};
use crate::module::{
    Import, Method, MethodAttributes, ModuleDescription, FLAG_INSTRUMENTED, FORMAT_VERSION, MAGIC,
};
use crate::opcode::{Instruction, Opcode};
use quill_primitives::{Address, U256};
use tracing::debug;

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(DecodeError::Truncated(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> DecodeResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> DecodeResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> DecodeResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> DecodeResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn str(&mut self) -> DecodeResult<String> {
        let len = usize::from(self.u16()?);
        let start = self.pos;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8(start))
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn instruction(&mut self) -> DecodeResult<Instruction> {
        let offset = self.pos;
        let byte = self.u8()?;
        let opcode = Opcode::from_byte(byte).ok_or(DecodeError::UnknownOpcode {
            opcode: byte,
            offset,
        })?;

        let instruction = match opcode {
            Opcode::Nop => Instruction::Nop,
            Opcode::PushInt => Instruction::PushInt(U256::from_big_endian(self.take(32)?)),
            Opcode::PushBytes => {
                let len = usize::from(self.u16()?);
                Instruction::PushBytes(self.take(len)?.to_vec())
            }
            Opcode::PushAddress => Instruction::PushAddress(Address::from_bytes(self.array()?)),
            Opcode::Pop => Instruction::Pop,
            Opcode::Dup => Instruction::Dup,
            Opcode::Swap => Instruction::Swap,
            Opcode::LoadArg => Instruction::LoadArg(self.u8()?),
            Opcode::LoadLocal => Instruction::LoadLocal(self.u8()?),
            Opcode::StoreLocal => Instruction::StoreLocal(self.u8()?),
            Opcode::Add => Instruction::Add,
            Opcode::Sub => Instruction::Sub,
            Opcode::Mul => Instruction::Mul,
            Opcode::Div => Instruction::Div,
            Opcode::Mod => Instruction::Mod,
            Opcode::Lt => Instruction::Lt,
            Opcode::Gt => Instruction::Gt,
            Opcode::Eq => Instruction::Eq,
            Opcode::IsZero => Instruction::IsZero,
            Opcode::And => Instruction::And,
            Opcode::Or => Instruction::Or,
            Opcode::Not => Instruction::Not,
            Opcode::Concat => Instruction::Concat,
            Opcode::Jump => Instruction::Jump(self.u32()?),
            Opcode::JumpIf => Instruction::JumpIf(self.u32()?),
            Opcode::Call => Instruction::Call(self.u16()?),
            Opcode::Return => Instruction::Return,
            Opcode::Stop => Instruction::Stop,
            Opcode::Abort => Instruction::Abort,
            Opcode::Host => Instruction::Host(self.u16()?),
            Opcode::FloatAdd => Instruction::FloatAdd,
            Opcode::FloatMul => Instruction::FloatMul,
            Opcode::FloatDiv => Instruction::FloatDiv,
            Opcode::Gas => Instruction::Gas(self.u64()?),
        };
        Ok(instruction)
    }

    fn method(&mut self) -> DecodeResult<Method> {
        let name = self.str()?;
        let raw_attributes = self.u8()?;
        let attributes = MethodAttributes::from_bits(raw_attributes)
            .ok_or(DecodeError::UnknownAttributes(raw_attributes))?;
        let params = self.u8()?;
        let locals = self.u8()?;
        let count = self.u32()? as usize;

        // every instruction is at least one byte
        let mut code = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            code.push(self.instruction()?);
        }

        Ok(Method {
            name,
            attributes,
            params,
            locals,
            code,
        })
    }
}

/// Parse raw module bytes
pub fn decompile(bytes: &[u8]) -> DecodeResult<ModuleDescription> {
    let result = parse(bytes);
    if let Err(err) = &result {
        debug!(error = %err, size = bytes.len(), "Malformed module");
    }
    result
}

fn parse(bytes: &[u8]) -> DecodeResult<ModuleDescription> {
    let mut reader = Reader::new(bytes);

    if reader.take(MAGIC.len()).map_err(|_| DecodeError::BadMagic)? != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let version = reader.u8()?;
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let flags = reader.u8()?;
    if flags & !FLAG_INSTRUMENTED != 0 {
        return Err(DecodeError::UnknownFlags(flags));
    }

    let contract_type = reader.str()?;
    let base_type = reader.str()?;

    let import_count = reader.u16()?;
    let mut imports = Vec::new();
    for _ in 0..import_count {
        imports.push(Import::new(reader.str()?));
    }

    let method_count = reader.u16()?;
    let mut methods = Vec::new();
    for _ in 0..method_count {
        methods.push(reader.method()?);
    }

    if reader.remaining() != 0 {
        return Err(DecodeError::TrailingBytes(reader.pos));
    }

    let initializer = methods.iter().position(|m| m.attributes.is_initializer());

    Ok(ModuleDescription {
        contract_type,
        base_type,
        imports,
        methods,
        initializer,
        instrumented: flags & FLAG_INSTRUMENTED != 0,
        code_size: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MethodBuilder, ModuleBuilder};
    use crate::opcode::HostFunction;
    use proptest::prelude::*;

    fn sample() -> ModuleDescription {
        ModuleBuilder::contract("Counter")
            .import("storage.get")
            .import("storage.set")
            .method(
                MethodBuilder::new("init")
                    .initializer()
                    .push_bytes(b"count")
                    .push_int(0)
                    .host(1)
                    .stop(),
            )
            .method(
                MethodBuilder::new("get")
                    .push_bytes(b"count")
                    .host(0)
                    .ret(),
            )
            .build()
    }

    // ==================== Happy path ====================

    #[test]
    fn test_decompile_builder_output() {
        let module = sample();
        let parsed = decompile(&module.encode()).unwrap();

        assert_eq!(parsed.contract_type, "Counter");
        assert_eq!(parsed.base_type, "SmartContract");
        assert_eq!(parsed.methods.len(), 2);
        assert_eq!(parsed.initializer, Some(0));
        assert_eq!(parsed.imports[1].host, Some(HostFunction::StorageSet));
        assert!(!parsed.instrumented);
        assert_eq!(parsed.methods, module.methods);
    }

    #[test]
    fn test_initializer_is_first_flagged_method() {
        let module = ModuleBuilder::contract("C")
            .method(MethodBuilder::new("a").stop())
            .method(MethodBuilder::new("b").initializer().stop())
            .method(MethodBuilder::new("c").initializer().stop())
            .build();
        assert_eq!(decompile(&module.encode()).unwrap().initializer, Some(1));
    }

    #[test]
    fn test_unknown_import_still_decodes() {
        let module = ModuleBuilder::contract("C")
            .import("clock.now")
            .method(MethodBuilder::new("a").stop())
            .build();
        let parsed = decompile(&module.encode()).unwrap();
        assert_eq!(parsed.imports[0].host, None);
    }

    // ==================== Malformed input ====================

    #[test]
    fn test_bad_magic() {
        assert_eq!(decompile(b""), Err(DecodeError::BadMagic));
        assert_eq!(decompile(b"QMOX\x01\x00"), Err(DecodeError::BadMagic));
    }

    #[test]
    fn test_bad_version_and_flags() {
        assert_eq!(
            decompile(b"QMOD\x02\x00"),
            Err(DecodeError::UnsupportedVersion(2))
        );
        assert_eq!(
            decompile(b"QMOD\x01\x80"),
            Err(DecodeError::UnknownFlags(0x80))
        );
    }

    #[test]
    fn test_every_truncation_fails() {
        let bytes = sample().encode();
        for len in 0..bytes.len() {
            assert!(decompile(&bytes[..len]).is_err(), "prefix {} decoded", len);
        }
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = sample().encode();
        let len = bytes.len();
        bytes.push(0);
        assert_eq!(decompile(&bytes), Err(DecodeError::TrailingBytes(len)));
    }

    #[test]
    fn test_unknown_opcode() {
        let mut bytes = ModuleBuilder::contract("C")
            .method(MethodBuilder::new("a").stop())
            .build()
            .encode();
        let last = bytes.len() - 1;
        bytes[last] = 0xEE;
        assert_eq!(
            decompile(&bytes),
            Err(DecodeError::UnknownOpcode {
                opcode: 0xEE,
                offset: last
            })
        );
    }

    #[test]
    fn test_invalid_utf8_name() {
        let mut bytes = ModuleBuilder::contract("C").build().encode();
        // type name payload starts after magic, version, flags and length
        bytes[8] = 0xFF;
        assert_eq!(decompile(&bytes), Err(DecodeError::InvalidUtf8(8)));
    }

    #[test]
    fn test_huge_instruction_count_is_truncation() {
        let mut bytes = ModuleBuilder::contract("C")
            .method(MethodBuilder::new("a"))
            .build()
            .encode();
        let count_at = bytes.len() - 4;
        bytes[count_at..].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(decompile(&bytes), Err(DecodeError::Truncated(_))));
    }

    proptest! {
        #[test]
        fn prop_arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decompile(&bytes);
        }

        #[test]
        fn prop_single_byte_corruption_is_caught_or_decodes(at in 0usize..64, byte in any::<u8>()) {
            let mut bytes = sample().encode();
            let at = at % bytes.len();
            bytes[at] = byte;
            if let Ok(module) = decompile(&bytes) {
                prop_assert_eq!(module.encode(), bytes);
            }
        }
    }
}
