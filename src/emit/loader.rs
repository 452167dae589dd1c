use crate::{
    emit::{
        error::LoadError,
        image::*,
        module::{Callable, EntryPoint, LoadedModule},
    },
    references::ReferenceSet,
    runtime::intrinsics::Intrinsic,
};
use nom::{
    bytes::complete::tag,
    combinator::{map, map_res},
    error::{Error as NomError, ErrorKind},
    multi::length_data,
    number::complete::{le_f64, le_i64, le_u16, le_u32, le_u8},
    IResult,
};
use std::sync::Arc;

type Input<'a> = &'a [u8];

/// Decodes an image without validating or linking it.
pub fn decode(bytes: &[u8]) -> Result<Image, LoadError> {
    let (input, _) = tag::<_, _, NomError<Input>>(&MAGIC[..])(bytes)
        .map_err(|_| LoadError::BadMagic)?;
    let (input, version) =
        le_u16::<_, NomError<Input>>(input).map_err(|err| malformed(bytes, err))?;
    if version != FORMAT_VERSION {
        return Err(LoadError::UnsupportedVersion {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let (rest, image) = image_body(input).map_err(|err| malformed(bytes, err))?;
    if !rest.is_empty() {
        return Err(LoadError::TrailingBytes {
            trailing: rest.len(),
        });
    }
    Ok(image)
}

/// Validates every operand and links imports against `references`.
pub fn load_module(image: Image, references: &ReferenceSet) -> Result<Arc<LoadedModule>, LoadError> {
    for function in &image.functions {
        validate_function(&image, function)?;
    }

    let imports = image
        .imports
        .iter()
        .map(|import| link_import(import, references))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Arc::new(LoadedModule {
        name: image.name,
        kind: image.kind,
        ordinal: image.ordinal,
        functions: image.functions,
        imports,
        slot_names: image.slot_names.into(),
    }))
}

/// Looks the entry routine up by its qualified name and hands back a typed
/// handle to it.
pub fn resolve_entry(module: &Arc<LoadedModule>, name: &str) -> Result<EntryPoint, LoadError> {
    let index = module.find(name).ok_or_else(|| LoadError::MissingEntryPoint {
        name: name.to_string(),
    })?;
    let callable = Callable::new(module.clone(), index);
    if callable.arity() != 0 {
        return Err(LoadError::InvalidEntryPoint {
            name: name.to_string(),
            arity: callable.proto().arity,
        });
    }
    Ok(EntryPoint::new(callable))
}

fn link_import(import: &ImportRef, references: &ReferenceSet) -> Result<Callable, LoadError> {
    references
        .library(&import.namespace)
        .and_then(|library| {
            library
                .export(&import.name)
                .map(|export| Callable::new(library.module().clone(), export.index))
        })
        .ok_or_else(|| LoadError::UnresolvedImport {
            namespace: import.namespace.clone(),
            name: import.name.clone(),
        })
}

fn validate_function(image: &Image, function: &FunctionProto) -> Result<(), LoadError> {
    if function.code.last() != Some(&Op::Return) {
        return Err(LoadError::UnterminatedFunction {
            function: function.name.clone(),
        });
    }
    let invalid = |pc: usize, detail: String| LoadError::InvalidOperand {
        function: function.name.clone(),
        pc,
        detail,
    };
    if function.locals < u16::from(function.arity) {
        let detail = format!(
            "{} locals cannot hold {} parameters",
            function.locals, function.arity
        );
        return Err(invalid(0, detail));
    }

    let own_record = match image.kind {
        ImageKind::Submission => image.ordinal.checked_sub(1),
        ImageKind::Library => None,
    };
    let code_len = function.code.len();
    let check = |pc: usize, ok: bool, detail: &dyn Fn() -> String| -> Result<(), LoadError> {
        if ok {
            Ok(())
        } else {
            Err(invalid(pc, detail()))
        }
    };

    for (pc, op) in function.code.iter().enumerate() {
        match *op {
            Op::Const(index) => check(pc, (index as usize) < function.constants.len(), &|| {
                format!("constant {index} out of range")
            })?,
            Op::LoadLocal(index) | Op::StoreLocal(index) => {
                check(pc, index < function.locals, &|| format!("local {index} out of range"))?
            }
            Op::LoadSlot { record, index } | Op::StoreSlot { record, index } => {
                let Some(own) = own_record else {
                    return Err(invalid(pc, "libraries have no submission state".into()));
                };
                check(pc, record <= own, &|| {
                    format!("record {record} belongs to a later submission")
                })?;
                if record == own {
                    check(pc, (index as usize) < image.slot_names.len(), &|| {
                        format!("slot {index} out of range")
                    })?;
                }
            }
            Op::LoadImport(index) => check(pc, (index as usize) < image.imports.len(), &|| {
                format!("import {index} out of range")
            })?,
            Op::LoadFunction(index) => {
                check(pc, (index as usize) < image.functions.len(), &|| {
                    format!("function {index} out of range")
                })?
            }
            Op::InitSubmission => check(pc, own_record.is_some(), &|| {
                String::from("only submissions own a record")
            })?,
            Op::Jump(target) | Op::JumpIfFalse(target) => {
                check(pc, (target as usize) < code_len, &|| {
                    format!("jump target {target} out of range")
                })?
            }
            Op::Intrinsic { id, .. } => check(pc, Intrinsic::from_id(id).is_some(), &|| {
                format!("unknown intrinsic {id}")
            })?,
            _ => {}
        }
    }
    Ok(())
}

fn malformed(bytes: &[u8], err: nom::Err<NomError<Input>>) -> LoadError {
    match err {
        nom::Err::Incomplete(_) => LoadError::Malformed {
            offset: bytes.len(),
            reason: "unexpected end of data",
        },
        nom::Err::Error(err) | nom::Err::Failure(err) => LoadError::Malformed {
            offset: bytes.len() - err.input.len(),
            reason: match err.code {
                ErrorKind::Eof => "unexpected end of data",
                ErrorKind::MapRes => "invalid UTF-8 in string",
                ErrorKind::Switch => "unknown opcode",
                ErrorKind::Tag => "unknown tag",
                _ => "unexpected data",
            },
        },
    }
}

fn failure<T>(input: Input, kind: ErrorKind) -> IResult<Input, T> {
    Err(nom::Err::Failure(NomError::new(input, kind)))
}

fn image_body(input: Input) -> IResult<Input, Image> {
    let (input, kind_tag) = le_u8(input)?;
    let Some(kind) = ImageKind::from_tag(kind_tag) else {
        return failure(input, ErrorKind::Tag);
    };
    let (input, name) = string(input)?;
    let (input, ordinal) = le_u32(input)?;
    let (input, slot_names) = counted(input, string)?;
    let (input, imports) = counted(input, import)?;
    let (input, functions) = counted(input, function)?;
    let (input, has_entry) = le_u8(input)?;
    let (input, entry) = match has_entry {
        0 => (input, None),
        1 => map(string, Some)(input)?,
        _ => return failure(input, ErrorKind::Tag),
    };
    Ok((
        input,
        Image {
            kind,
            name,
            ordinal,
            slot_names,
            imports,
            functions,
            entry,
        },
    ))
}

fn string(input: Input) -> IResult<Input, String> {
    map_res(length_data(le_u32), |bytes: &[u8]| {
        std::str::from_utf8(bytes).map(str::to_owned)
    })(input)
}

/// A `u32` count followed by that many items. Every item takes at least one
/// byte, so a count larger than the remaining input is rejected up front.
fn counted<'a, O>(
    input: Input<'a>,
    mut item: impl FnMut(Input<'a>) -> IResult<Input<'a>, O>,
) -> IResult<Input<'a>, Vec<O>> {
    let (mut input, len) = le_u32(input)?;
    let len = len as usize;
    if len > input.len() {
        return failure(input, ErrorKind::Eof);
    }
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        let (rest, value) = item(input)?;
        items.push(value);
        input = rest;
    }
    Ok((input, items))
}

fn import(input: Input) -> IResult<Input, ImportRef> {
    let (input, namespace) = string(input)?;
    let (input, name) = string(input)?;
    Ok((input, ImportRef { namespace, name }))
}

fn function(input: Input) -> IResult<Input, FunctionProto> {
    let (input, name) = string(input)?;
    let (input, arity) = le_u8(input)?;
    let (input, locals) = le_u16(input)?;
    let (input, constants) = counted(input, constant)?;
    let (input, code) = counted(input, op)?;
    let (input, lines) = counted(input, line_entry)?;
    Ok((
        input,
        FunctionProto {
            name,
            arity,
            locals,
            constants,
            code,
            lines,
        },
    ))
}

fn constant(input: Input) -> IResult<Input, Constant> {
    let (input, tag) = le_u8(input)?;
    match tag {
        Constant::TAG_INT => map(le_i64, Constant::Int)(input),
        Constant::TAG_FLOAT => map(le_f64, Constant::Float)(input),
        Constant::TAG_STR => map(string, Constant::Str)(input),
        _ => failure(input, ErrorKind::Tag),
    }
}

fn line_entry(input: Input) -> IResult<Input, LineEntry> {
    let (input, op) = le_u32(input)?;
    let (input, line) = le_u32(input)?;
    Ok((input, LineEntry { op, line }))
}

fn slot(input: Input) -> IResult<Input, (u32, u16)> {
    let (input, record) = le_u32(input)?;
    let (input, index) = le_u16(input)?;
    Ok((input, (record, index)))
}

fn op(input: Input) -> IResult<Input, Op> {
    let (input, opcode) = le_u8(input)?;
    let simple = |op: Op| -> IResult<Input, Op> { Ok((input, op)) };
    match opcode {
        0x00 => map(le_u16, Op::Const)(input),
        0x01 => simple(Op::Unit),
        0x02 => simple(Op::True),
        0x03 => simple(Op::False),
        0x04 => map(le_u16, Op::LoadLocal)(input),
        0x05 => map(le_u16, Op::StoreLocal)(input),
        0x06 => map(slot, |(record, index)| Op::LoadSlot { record, index })(input),
        0x07 => map(slot, |(record, index)| Op::StoreSlot { record, index })(input),
        0x08 => map(le_u16, Op::LoadImport)(input),
        0x09 => map(le_u16, Op::LoadFunction)(input),
        0x0A => simple(Op::InitSubmission),
        0x10 => simple(Op::Add),
        0x11 => simple(Op::Sub),
        0x12 => simple(Op::Mul),
        0x13 => simple(Op::Div),
        0x14 => simple(Op::Rem),
        0x15 => simple(Op::Neg),
        0x16 => simple(Op::Not),
        0x17 => simple(Op::Eq),
        0x18 => simple(Op::Ne),
        0x19 => simple(Op::Lt),
        0x1A => simple(Op::Le),
        0x1B => simple(Op::Gt),
        0x1C => simple(Op::Ge),
        0x20 => map(le_u32, Op::Jump)(input),
        0x21 => map(le_u32, Op::JumpIfFalse)(input),
        0x22 => simple(Op::Pop),
        0x23 => map(le_u8, Op::Call)(input),
        0x24 => {
            let (input, id) = le_u8(input)?;
            let (input, argc) = le_u8(input)?;
            Ok((input, Op::Intrinsic { id, argc }))
        }
        0x25 => map(le_u16, Op::MakeList)(input),
        0x26 => simple(Op::Index),
        0x27 => simple(Op::SetIndex),
        0x28 => simple(Op::Return),
        _ => failure(input, ErrorKind::Switch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::writer::write_image;

    fn sample() -> Image {
        Image {
            kind: ImageKind::Submission,
            name: "Submission#1".into(),
            ordinal: 1,
            slot_names: vec!["x".into()],
            imports: Vec::new(),
            functions: vec![FunctionProto {
                name: "Submission#1.<Main>".into(),
                arity: 0,
                locals: 0,
                constants: vec![Constant::Int(5), Constant::Str("hi".into())],
                code: vec![
                    Op::InitSubmission,
                    Op::Const(0),
                    Op::StoreSlot {
                        record: 0,
                        index: 0,
                    },
                    Op::LoadSlot {
                        record: 0,
                        index: 0,
                    },
                    Op::Return,
                ],
                lines: vec![LineEntry { op: 0, line: 1 }],
            }],
            entry: Some("Submission#1.<Main>".into()),
        }
    }

    #[test]
    fn decodes_what_the_writer_produces() {
        let image = sample();
        assert_eq!(decode(&write_image(&image)).expect("decode"), image);
    }

    #[test]
    fn rejects_bad_magic_and_version() {
        assert!(matches!(decode(b"NOPE"), Err(LoadError::BadMagic)));
        let mut bytes = write_image(&sample());
        bytes[4] = 9;
        assert!(matches!(
            decode(&bytes),
            Err(LoadError::UnsupportedVersion { found: 9, .. })
        ));
    }

    #[test]
    fn truncated_image_reports_offset() {
        let bytes = write_image(&sample());
        let err = decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }), "{err:?}");
    }

    #[test]
    fn validation_catches_bad_operands() {
        let mut image = sample();
        image.functions[0].code.insert(0, Op::Jump(99));
        let err = load_module(image, &ReferenceSet::empty()).unwrap_err();
        assert!(matches!(err, LoadError::InvalidOperand { pc: 0, .. }), "{err:?}");
    }

    #[test]
    fn unresolved_import_fails_to_link() {
        let mut image = sample();
        image.imports.push(ImportRef {
            namespace: "math".into(),
            name: "abs".into(),
        });
        let err = load_module(image, &ReferenceSet::empty()).unwrap_err();
        assert!(matches!(err, LoadError::UnresolvedImport { .. }));
    }

    #[test]
    fn entry_is_resolved_by_qualified_name() {
        let module = load_module(sample(), &ReferenceSet::empty()).expect("load");
        let entry = resolve_entry(&module, "Submission#1.<Main>").expect("entry");
        assert_eq!(entry.record_index(), Some(0));
        assert!(matches!(
            resolve_entry(&module, "Submission#1.main"),
            Err(LoadError::MissingEntryPoint { .. })
        ));
    }
}
