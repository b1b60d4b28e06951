use std::fmt::Write;

use thiserror::Error;

use crate::frontend::{BasicKind, Field, Member, Package, TypeDef, TypeId, TypeKind};
use crate::hex::{word_to_addr, WORD};
use crate::resolve::Bound;
use crate::scan::{Call, FrameRecord};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("argument buffer ended early for a frame not marked truncated")]
    UnexpectedUnderrun,
    #[error("unknown basic kind for type {0:?}")]
    UnknownBasicKind(String),
    #[error("cannot decode values of type {0:?}")]
    UnknownComposite(String),
    #[error("type reference #{0} missing from package graph")]
    MissingType(TypeId),
}

// Both cursors over argument bytes answer the same question: the next
// `size` bytes for the value being rendered, and whether all of them were
// there.
pub trait Reader {
    fn read(&mut self, size: usize) -> (&[u8], bool);
}

/// Word-aware cursor over a call's spilled argument words. Values never
/// straddle a word boundary, and sub-word values sit at offsets that are a
/// multiple of their own size within the word.
pub struct ArgReader<'a> {
    remaining: &'a [u8],
    word_remaining: usize,
}

impl<'a> ArgReader<'a> {
    pub fn new(arg_bytes: &'a [u8]) -> Self {
        Self {
            remaining: arg_bytes,
            word_remaining: arg_bytes.len() % WORD,
        }
    }
}

impl Reader for ArgReader<'_> {
    fn read(&mut self, size: usize) -> (&[u8], bool) {
        // spill: the value does not fit in what is left of this word
        if size > self.word_remaining && self.word_remaining != WORD {
            let skip = self.word_remaining.min(self.remaining.len());
            self.remaining = &self.remaining[skip..];
            self.word_remaining = WORD;
        }
        if size != 0 && size < WORD {
            let to_align = (self.word_remaining % size).min(self.remaining.len());
            self.remaining = &self.remaining[to_align..];
            self.word_remaining -= to_align;
        }

        if size > self.remaining.len() {
            return (self.remaining, false);
        }

        let (bytes, rest) = self.remaining.split_at(size);
        if size < self.word_remaining {
            self.word_remaining -= size;
        } else {
            self.word_remaining = WORD - (size % WORD);
        }
        self.remaining = rest;

        (bytes, true)
    }
}

// Cursor over one record's window, driven by the front-end's offset table
// rather than by consumption order.
pub struct StructReader<'a> {
    offsets: Vec<u64>,
    idx: usize,
    window: &'a [u8],
}

impl<'a> StructReader<'a> {
    pub fn new(members: &[Member], window: &'a [u8]) -> Self {
        Self {
            offsets: members.iter().map(|m| m.offset).collect(),
            idx: 0,
            window,
        }
    }
}

impl Reader for StructReader<'_> {
    fn read(&mut self, size: usize) -> (&[u8], bool) {
        let Some(&offset) = self.offsets.get(self.idx) else {
            return (&[], false);
        };
        self.idx += 1;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);

        if size == 0 {
            return (&[], true);
        }
        if self.window.len() <= offset {
            return (&[], false);
        }
        if self.window.len() - offset < size {
            return (&self.window[offset..], false);
        }
        (&self.window[offset..offset + size], true)
    }
}

/// Renders one call occurrence of a bound frame as its replacement line.
pub fn render_call(
    frame: &FrameRecord,
    bound: &Bound,
    pkg: &Package,
    call: &Call,
) -> Result<String, RenderError> {
    let mut r = Renderer {
        pkg,
        truncated: call.truncated,
        out: String::new(),
    };
    let mut args = ArgReader::new(&call.arg_bytes);

    r.out.push_str(&frame.pkg_name);
    r.out.push('.');
    let mut ok = true;
    if let Some(recv) = &bound.recv {
        r.out.push('(');
        ok = r.field_list(recv, &mut args)?;
        r.out.push_str(").");
    }
    r.out.push_str(&frame.func_name);
    r.out.push('(');
    if ok {
        ok = r.field_list(&bound.params, &mut args)?;
    } else {
        r.out.push_str("...");
    }
    r.out.push(')');
    if !bound.results.is_empty() {
        r.out.push_str(" (");
        if ok {
            r.field_list(&bound.results, &mut args)?;
        } else {
            r.out.push_str("...");
        }
        r.out.push(')');
    }

    Ok(r.out)
}

struct Renderer<'a> {
    pkg: &'a Package,
    truncated: bool,
    out: String,
}

impl<'a> Renderer<'a> {
    fn type_def(&self, id: TypeId) -> Result<&'a TypeDef, RenderError> {
        self.pkg
            .types
            .get(id.0 as usize)
            .ok_or(RenderError::MissingType(id))
    }

    // Returns false once the buffer ran out on a truncated occurrence;
    // nothing further may be rendered after that.
    fn field_list(&mut self, fields: &[Field], r: &mut dyn Reader) -> Result<bool, RenderError> {
        let mut idx = 0usize;
        for field in fields {
            // a field with several names consumes one slice per name; a
            // field with none still consumes one, under a synthesized name
            for k in 0..field.names.len().max(1) {
                if idx != 0 {
                    self.out.push_str(", ");
                }
                match field.names.get(k) {
                    Some(name) => self.out.push_str(name),
                    None => {
                        let _ = write!(self.out, "~{idx}");
                    }
                }
                self.out.push(' ');
                if !self.value(field.type_id, r, false)? {
                    return Ok(false);
                }
                idx += 1;
            }
        }
        Ok(true)
    }

    fn value(
        &mut self,
        id: TypeId,
        r: &mut dyn Reader,
        suppress_name: bool,
    ) -> Result<bool, RenderError> {
        let ty = self.type_def(id)?;
        match &ty.kind {
            TypeKind::Array { elem, len } => {
                if !suppress_name {
                    self.type_name(ty);
                }
                self.out.push('[');
                let mut ok = true;
                for i in 0..*len {
                    if i != 0 {
                        self.out.push_str(", ");
                    }
                    ok = self.value(*elem, r, true)?;
                    if !ok {
                        break;
                    }
                }
                self.out.push(']');
                Ok(ok)
            }
            TypeKind::Struct { members } => {
                if !suppress_name {
                    self.type_name(ty);
                }
                let size = usize::try_from(ty.size).unwrap_or(usize::MAX);
                let (window, complete) = r.read(size);
                if !complete && !self.truncated {
                    return Err(RenderError::UnexpectedUnderrun);
                }
                let mut inner = StructReader::new(members, window);
                self.out.push('{');
                let mut ok = true;
                for (i, member) in members.iter().enumerate() {
                    if i != 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(&member.name);
                    self.out.push_str(": ");
                    ok = self.value(member.type_id, &mut inner, true)?;
                    if !ok {
                        break;
                    }
                }
                self.out.push('}');
                Ok(ok)
            }
            _ => {
                if !suppress_name {
                    self.type_name(ty);
                    self.out.push(' ');
                }
                let size = usize::try_from(ty.size).unwrap_or(usize::MAX);
                let (bytes, complete) = r.read(size);
                if !complete {
                    if !self.truncated {
                        return Err(RenderError::UnexpectedUnderrun);
                    }
                    self.out.push_str("...");
                    return Ok(false);
                }
                self.leaf(ty, bytes)?;
                Ok(true)
            }
        }
    }

    fn leaf(&mut self, ty: &TypeDef, bytes: &[u8]) -> Result<(), RenderError> {
        match &ty.kind {
            TypeKind::Interface => {
                let _ = write!(
                    self.out,
                    "{{type: {}, data: {}}}",
                    fmt_ptr(&bytes[..WORD]),
                    fmt_ptr(&bytes[WORD..])
                );
            }
            TypeKind::Slice => {
                let _ = write!(
                    self.out,
                    "{{data: {}, len: {}, cap: {}}}",
                    fmt_ptr(&bytes[..WORD]),
                    word_to_addr(&bytes[WORD..]),
                    word_to_addr(&bytes[2 * WORD..])
                );
            }
            TypeKind::Pointer | TypeKind::Map | TypeKind::Chan | TypeKind::Func => {
                self.out.push_str(&fmt_ptr(bytes));
            }
            TypeKind::Basic { basic } => self.basic(*basic, &ty.name, bytes)?,
            TypeKind::Opaque => return Err(RenderError::UnknownComposite(ty.name.clone())),
            TypeKind::Array { .. } | TypeKind::Struct { .. } => {
                unreachable!("composites are rendered structurally")
            }
        }
        Ok(())
    }

    fn basic(&mut self, kind: BasicKind, name: &str, b: &[u8]) -> Result<(), RenderError> {
        match kind {
            BasicKind::Bool => self.out.push_str(if b[0] != 0 { "true" } else { "false" }),
            BasicKind::Int => {
                let v = isize::from_ne_bytes(b[..WORD].try_into().unwrap());
                let _ = write!(self.out, "{v}");
            }
            BasicKind::Int8 => {
                let _ = write!(self.out, "{}", b[0] as i8);
            }
            BasicKind::Int16 => {
                let _ = write!(self.out, "{}", i16::from_ne_bytes(b[..2].try_into().unwrap()));
            }
            BasicKind::Int32 => {
                let _ = write!(self.out, "{}", i32::from_ne_bytes(b[..4].try_into().unwrap()));
            }
            BasicKind::Int64 => {
                let _ = write!(self.out, "{}", i64::from_ne_bytes(b[..8].try_into().unwrap()));
            }
            BasicKind::Uint => {
                let _ = write!(self.out, "{}", word_to_addr(b));
            }
            BasicKind::Uint8 => {
                let _ = write!(self.out, "{}", b[0]);
            }
            BasicKind::Uint16 => {
                let _ = write!(self.out, "{}", u16::from_ne_bytes(b[..2].try_into().unwrap()));
            }
            BasicKind::Uint32 => {
                let _ = write!(self.out, "{}", u32::from_ne_bytes(b[..4].try_into().unwrap()));
            }
            BasicKind::Uint64 => {
                let _ = write!(self.out, "{}", u64::from_ne_bytes(b[..8].try_into().unwrap()));
            }
            BasicKind::Uintptr => {
                let _ = write!(self.out, "{}", word_to_addr(b));
            }
            BasicKind::Float32 => {
                let _ = write!(self.out, "{}", f32::from_ne_bytes(b[..4].try_into().unwrap()));
            }
            BasicKind::Float64 => {
                let _ = write!(self.out, "{}", f64::from_ne_bytes(b[..8].try_into().unwrap()));
            }
            BasicKind::Complex64 => {
                let re = f32::from_ne_bytes(b[..4].try_into().unwrap());
                let im = f32::from_ne_bytes(b[4..8].try_into().unwrap());
                if im < 0.0 {
                    let _ = write!(self.out, "({re}{im}i)");
                } else {
                    let _ = write!(self.out, "({re}+{im}i)");
                }
            }
            BasicKind::Complex128 => {
                let re = f64::from_ne_bytes(b[..8].try_into().unwrap());
                let im = f64::from_ne_bytes(b[8..16].try_into().unwrap());
                if im < 0.0 {
                    let _ = write!(self.out, "({re}{im}i)");
                } else {
                    let _ = write!(self.out, "({re}+{im}i)");
                }
            }
            BasicKind::String => {
                let _ = write!(
                    self.out,
                    "{{data: {}, len: {}}}",
                    fmt_ptr(&b[..WORD]),
                    word_to_addr(&b[WORD..])
                );
            }
            BasicKind::UnsafePointer => self.out.push_str(&fmt_ptr(b)),
            BasicKind::Unknown => return Err(RenderError::UnknownBasicKind(name.to_string())),
        }
        Ok(())
    }

    fn type_name(&mut self, ty: &TypeDef) {
        let mut name = ty.name.clone();
        if !self.pkg.path.is_empty() {
            // types defined in the function's own package print unqualified
            name = name.replace(&format!("{}.", self.pkg.path), "");
        }
        if name.contains(' ') {
            self.out.push('(');
            self.out.push_str(&name);
            self.out.push(')');
        } else {
            self.out.push_str(&name);
        }
    }
}

fn fmt_ptr(bytes: &[u8]) -> String {
    let p = word_to_addr(bytes);
    if p == 0 {
        "nil".to_string()
    } else {
        format!("{p:#x}")
    }
}
