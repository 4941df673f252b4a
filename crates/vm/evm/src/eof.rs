//! EOF v1 container parsing and validation (EIP-3540/EIP-4750/EIP-5450).
//!
//! Legacy code is just bytes plus a `JUMPDEST` bitmap (see
//! `interpreter::shared_cache`). EOF code additionally carries a type
//! section (stack input/output/max-height per code section), one or more
//! code sections, optional sub-containers, and a data section. All of this
//! is validated once, at parse time; nothing here re-checks bounds while
//! stepping the interpreter.

use std::fmt;

const MAGIC: [u8; 2] = [0xef, 0x00];
const VERSION: u8 = 0x01;

const KIND_TYPE: u8 = 0x01;
const KIND_CODE: u8 = 0x02;
const KIND_CONTAINER: u8 = 0x03;
const KIND_DATA: u8 = 0x04;
const TERMINATOR: u8 = 0x00;

const MAX_CODE_SECTIONS: usize = 1024;
const MAX_CONTAINER_SECTIONS: usize = 256;
const MAX_STACK_HEIGHT: usize = 1023;

/// Per-code-section stack metadata, from the container's type section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSection {
    /// Number of stack inputs the section expects on entry.
    pub inputs: u8,
    /// Number of stack outputs the section leaves on a normal `RETF`
    /// (`0x80` marks the section as non-returning, i.e. it only exits via
    /// `STOP`/`RETURN`/`REVERT`/terminal `JUMPF`).
    pub outputs: u8,
    /// Maximum stack height reachable within the section.
    pub max_stack_height: u16,
}

impl TypeSection {
    pub fn is_non_returning(&self) -> bool {
        self.outputs == 0x80
    }
}

/// A fully parsed and structurally validated EOF v1 container.
#[derive(Debug, Clone)]
pub struct Container {
    pub types: Vec<TypeSection>,
    pub code_sections: Vec<Vec<u8>>,
    pub container_sections: Vec<Vec<u8>>,
    pub data: Vec<u8>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum EofError {
    InvalidMagic,
    InvalidVersion,
    MissingTypeSection,
    MissingCodeSection,
    TooManyCodeSections,
    TooManyContainerSections,
    SectionCountMismatch,
    TruncatedHeader,
    TruncatedBody,
    InvalidSectionSize,
    InvalidTypeSection,
    StackHeightOutOfRange,
    EmptyCodeSection,
}

impl fmt::Display for EofError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            EofError::InvalidMagic => "not an EOF container",
            EofError::InvalidVersion => "unsupported EOF version",
            EofError::MissingTypeSection => "missing type section",
            EofError::MissingCodeSection => "missing code section",
            EofError::TooManyCodeSections => "too many code sections",
            EofError::TooManyContainerSections => "too many container sections",
            EofError::SectionCountMismatch => "type section count does not match code section count",
            EofError::TruncatedHeader => "truncated section header",
            EofError::TruncatedBody => "truncated section body",
            EofError::InvalidSectionSize => "zero-length section",
            EofError::InvalidTypeSection => "malformed type section entry",
            EofError::StackHeightOutOfRange => "max_stack_height exceeds limit",
            EofError::EmptyCodeSection => "code section has no body",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for EofError {}

/// Whether `code` starts with the EOF magic (`0xEF00`), i.e. should be
/// parsed as a container rather than legacy bytecode.
pub fn has_eof_magic(code: &[u8]) -> bool {
    code.len() >= 2 && code[0] == MAGIC[0] && code[1] == MAGIC[1]
}

/// Parses and structurally validates an EOF v1 container.
pub fn parse(code: &[u8]) -> Result<Container, EofError> {
    if !has_eof_magic(code) {
        return Err(EofError::InvalidMagic);
    }
    if code.len() < 3 || code[2] != VERSION {
        return Err(EofError::InvalidVersion);
    }

    let mut pos = 3;
    let mut type_size = None;
    let mut code_sizes: Vec<usize> = Vec::new();
    let mut container_sizes: Vec<usize> = Vec::new();
    let mut data_size = None;
    // Sections must appear in this order: type, code, container, data.
    let mut last_kind = 0u8;

    loop {
        let kind = *code.get(pos).ok_or(EofError::TruncatedHeader)?;
        pos += 1;

        if kind != TERMINATOR {
            if kind <= last_kind {
                return Err(EofError::TruncatedHeader);
            }
            last_kind = kind;
        }

        match kind {
            TERMINATOR => break,
            KIND_TYPE => {
                type_size = Some(read_u16(code, &mut pos)? as usize);
            }
            KIND_CODE => {
                let count = read_u16(code, &mut pos)? as usize;
                if count == 0 {
                    return Err(EofError::MissingCodeSection);
                }
                if count > MAX_CODE_SECTIONS {
                    return Err(EofError::TooManyCodeSections);
                }
                for _ in 0..count {
                    code_sizes.push(read_u16(code, &mut pos)? as usize);
                }
            }
            KIND_CONTAINER => {
                let count = read_u16(code, &mut pos)? as usize;
                if count > MAX_CONTAINER_SECTIONS {
                    return Err(EofError::TooManyContainerSections);
                }
                for _ in 0..count {
                    container_sizes.push(read_u16(code, &mut pos)? as usize);
                }
            }
            KIND_DATA => {
                data_size = Some(read_u16(code, &mut pos)? as usize);
            }
            _ => return Err(EofError::TruncatedHeader),
        }
    }

    let type_size = type_size.ok_or(EofError::MissingTypeSection)?;
    if code_sizes.is_empty() {
        return Err(EofError::MissingCodeSection);
    }
    if type_size != code_sizes.len() * 4 {
        return Err(EofError::SectionCountMismatch);
    }
    let data_size = data_size.unwrap_or(0);

    if code_sizes.iter().any(|&s| s == 0) {
        return Err(EofError::EmptyCodeSection);
    }

    // Body: type section, then each code section, then each container
    // section, then data (which may be shorter than declared only when
    // still being streamed in by `RETURNCONTRACT`; top-level parse requires
    // the exact declared length).
    let body = &code[pos..];
    let mut off = 0usize;

    let types_bytes = take(body, &mut off, type_size)?;
    let types = parse_type_section(types_bytes, code_sizes.len())?;

    let mut code_sections = Vec::with_capacity(code_sizes.len());
    for &size in &code_sizes {
        code_sections.push(take(body, &mut off, size)?.to_vec());
    }

    let mut container_sections = Vec::with_capacity(container_sizes.len());
    for &size in &container_sizes {
        container_sections.push(take(body, &mut off, size)?.to_vec());
    }

    let data = take(body, &mut off, data_size)?.to_vec();

    if off != body.len() {
        return Err(EofError::TruncatedBody);
    }

    Ok(Container {
        types,
        code_sections,
        container_sections,
        data,
    })
}

fn read_u16(code: &[u8], pos: &mut usize) -> Result<u16, EofError> {
    let bytes = code.get(*pos..*pos + 2).ok_or(EofError::TruncatedHeader)?;
    *pos += 2;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn take<'a>(body: &'a [u8], off: &mut usize, len: usize) -> Result<&'a [u8], EofError> {
    let slice = body.get(*off..*off + len).ok_or(EofError::TruncatedBody)?;
    *off += len;
    Ok(slice)
}

fn parse_type_section(bytes: &[u8], expected_sections: usize) -> Result<Vec<TypeSection>, EofError> {
    if bytes.len() != expected_sections * 4 {
        return Err(EofError::InvalidTypeSection);
    }
    let mut types = Vec::with_capacity(expected_sections);
    for chunk in bytes.chunks_exact(4) {
        let max_stack_height = u16::from_be_bytes([chunk[2], chunk[3]]);
        if max_stack_height as usize > MAX_STACK_HEIGHT {
            return Err(EofError::StackHeightOutOfRange);
        }
        types.push(TypeSection {
            inputs: chunk[0],
            outputs: chunk[1],
            max_stack_height,
        });
    }
    // Section 0 is the entry point: it must take no inputs and be
    // non-returning (it can only terminate the top-level execution).
    if types[0].inputs != 0 || !types[0].is_non_returning() {
        return Err(EofError::InvalidTypeSection);
    }
    Ok(types)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(types: &[u8], code_sections: &[&[u8]], data: &[u8]) -> Vec<u8> {
        let mut out = vec![0xef, 0x00, 0x01];
        out.push(KIND_TYPE);
        out.extend_from_slice(&(types.len() as u16).to_be_bytes());
        out.push(KIND_CODE);
        out.extend_from_slice(&(code_sections.len() as u16).to_be_bytes());
        for s in code_sections {
            out.extend_from_slice(&(s.len() as u16).to_be_bytes());
        }
        out.push(KIND_DATA);
        out.extend_from_slice(&(data.len() as u16).to_be_bytes());
        out.push(TERMINATOR);
        out.extend_from_slice(types);
        for s in code_sections {
            out.extend_from_slice(s);
        }
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn rejects_non_eof_code() {
        assert!(!has_eof_magic(&[0x60, 0x00]));
        assert_eq!(parse(&[0x60, 0x00]), Err(EofError::InvalidMagic));
    }

    #[test]
    fn parses_single_section_container() {
        let types = [0u8, 0x80, 0x00, 0x02];
        let code = [0x60, 0x00, 0x00]; // PUSH1 0 STOP
        let raw = build(&types, &[&code], &[]);
        let container = parse(&raw).expect("valid container");
        assert_eq!(container.code_sections.len(), 1);
        assert_eq!(container.code_sections[0], code);
        assert_eq!(container.types[0].max_stack_height, 2);
        assert!(container.types[0].is_non_returning());
    }

    #[test]
    fn rejects_entry_section_with_inputs() {
        let types = [1u8, 0x80, 0x00, 0x00];
        let raw = build(&types, &[&[0x00]], &[]);
        assert_eq!(parse(&raw), Err(EofError::InvalidTypeSection));
    }

    #[test]
    fn rejects_mismatched_type_count() {
        // type section (4 bytes, one entry) but two code sections declared
        let raw = build(&[0u8, 0x80, 0x00, 0x00], &[&[0x00], &[0x00]], &[]);
        assert_eq!(parse(&raw), Err(EofError::SectionCountMismatch));
    }

    #[test]
    fn rejects_truncated_body() {
        let mut raw = build(&[0u8, 0x80, 0x00, 0x00], &[&[0x00]], &[]);
        raw.pop();
        assert_eq!(parse(&raw), Err(EofError::TruncatedBody));
    }
}
