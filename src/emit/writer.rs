use crate::emit::image::{Constant, FunctionProto, Image, Op, FORMAT_VERSION, MAGIC};

pub fn write_image(image: &Image) -> Vec<u8> {
    let mut writer = Writer::default();
    writer.bytes(MAGIC);
    writer.u16(FORMAT_VERSION);
    writer.u8(image.kind.tag());
    writer.string(&image.name);
    writer.u32(image.ordinal);

    writer.len(image.slot_names.len());
    for name in &image.slot_names {
        writer.string(name);
    }

    writer.len(image.imports.len());
    for import in &image.imports {
        writer.string(&import.namespace);
        writer.string(&import.name);
    }

    writer.len(image.functions.len());
    for function in &image.functions {
        writer.function(function);
    }

    match &image.entry {
        Some(entry) => {
            writer.u8(1);
            writer.string(entry);
        }
        None => writer.u8(0),
    }
    writer.out
}

#[derive(Default)]
struct Writer {
    out: Vec<u8>,
}

impl Writer {
    fn function(&mut self, function: &FunctionProto) {
        self.string(&function.name);
        self.u8(function.arity);
        self.u16(function.locals);

        self.len(function.constants.len());
        for constant in &function.constants {
            match constant {
                Constant::Int(value) => {
                    self.u8(Constant::TAG_INT);
                    self.bytes(&value.to_le_bytes());
                }
                Constant::Float(value) => {
                    self.u8(Constant::TAG_FLOAT);
                    self.bytes(&value.to_le_bytes());
                }
                Constant::Str(value) => {
                    self.u8(Constant::TAG_STR);
                    self.string(value);
                }
            }
        }

        self.len(function.code.len());
        for op in &function.code {
            self.op(op);
        }

        self.len(function.lines.len());
        for entry in &function.lines {
            self.u32(entry.op);
            self.u32(entry.line);
        }
    }

    fn op(&mut self, op: &Op) {
        self.u8(op.opcode());
        match *op {
            Op::Const(index)
            | Op::LoadLocal(index)
            | Op::StoreLocal(index)
            | Op::LoadImport(index)
            | Op::LoadFunction(index)
            | Op::MakeList(index) => self.u16(index),
            Op::LoadSlot { record, index } | Op::StoreSlot { record, index } => {
                self.u32(record);
                self.u16(index);
            }
            Op::Jump(target) | Op::JumpIfFalse(target) => self.u32(target),
            Op::Call(argc) => self.u8(argc),
            Op::Intrinsic { id, argc } => {
                self.u8(id);
                self.u8(argc);
            }
            Op::Unit
            | Op::True
            | Op::False
            | Op::InitSubmission
            | Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Rem
            | Op::Neg
            | Op::Not
            | Op::Eq
            | Op::Ne
            | Op::Lt
            | Op::Le
            | Op::Gt
            | Op::Ge
            | Op::Pop
            | Op::Index
            | Op::SetIndex
            | Op::Return => {}
        }
    }

    fn string(&mut self, value: &str) {
        self.len(value.len());
        self.bytes(value.as_bytes());
    }

    // Codegen bounds every table well below `u32::MAX`.
    fn len(&mut self, len: usize) {
        self.u32(len as u32);
    }

    fn u8(&mut self, value: u8) {
        self.out.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.bytes(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.bytes(&value.to_le_bytes());
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::image::ImageKind;

    #[test]
    fn header_layout() {
        let image = Image {
            kind: ImageKind::Library,
            name: "m".into(),
            ordinal: 0,
            slot_names: Vec::new(),
            imports: Vec::new(),
            functions: Vec::new(),
            entry: None,
        };
        let bytes = write_image(&image);
        assert_eq!(&bytes[..4], b"PRIM");
        assert_eq!(&bytes[4..6], &FORMAT_VERSION.to_le_bytes());
        assert_eq!(bytes[6], 1);
        assert_eq!(&bytes[7..12], &[1, 0, 0, 0, b'm']);
        assert_eq!(bytes.len(), 12 + 4 + 4 + 4 + 4 + 1);
    }
}
