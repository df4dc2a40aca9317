//! Line table encoding.
//!
//! The table is a sequence of entries, each covering 1 to 8 code words. An
//! entry starts with a header byte `1ccc_clll` where `cccc` is the entry code
//! and `lll` is the covered word count minus one. Code [`LINE_DELTA`] is
//! followed by a signed varint holding the line delta from the previous
//! entry; code [`NO_LINE`] marks words with no source line.

// Header and varint bytes are masked before narrowing.
#![allow(clippy::cast_possible_truncation)]

use super::DecodeError;

/// Entry code: a signed line delta follows.
pub const LINE_DELTA: u8 = 13;
/// Entry code: the covered words have no line.
pub const NO_LINE: u8 = 15;
/// Maximum words covered by one entry.
pub const MAX_ENTRY_WORDS: usize = 8;

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 64 {
        out.push(0x40 | (value & 63) as u8);
        value >>= 6;
    }
    out.push(value as u8);
}

fn write_signed_varint(out: &mut Vec<u8>, value: i64) {
    let zigzag = if value < 0 {
        (value.unsigned_abs() << 1) | 1
    } else {
        value.unsigned_abs() << 1
    };
    write_varint(out, zigzag);
}

fn read_varint(table: &[u8], pos: &mut usize) -> Result<u64, DecodeError> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *table.get(*pos).ok_or(DecodeError::LineTable("truncated varint"))?;
        *pos += 1;
        if shift > 60 {
            return Err(DecodeError::LineTable("varint too long"));
        }
        value |= u64::from(byte & 63) << shift;
        shift += 6;
        if byte & 0x40 == 0 {
            return Ok(value);
        }
    }
}

fn read_signed_varint(table: &[u8], pos: &mut usize) -> Result<i64, DecodeError> {
    let raw = read_varint(table, pos)?;
    let magnitude = i64::try_from(raw >> 1).map_err(|_| DecodeError::LineTable("delta overflow"))?;
    Ok(if raw & 1 == 1 { -magnitude } else { magnitude })
}

/// Encode per-word source lines.
#[must_use]
pub fn encode(first_line: u32, lines: &[Option<u32>]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut previous = i64::from(first_line);
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let mut run = 1;
        while run < MAX_ENTRY_WORDS && i + run < lines.len() && lines[i + run] == line {
            run += 1;
        }
        let len_bits = (run - 1) as u8;
        match line {
            Some(line) => {
                out.push(0x80 | (LINE_DELTA << 3) | len_bits);
                let line = i64::from(line);
                write_signed_varint(&mut out, line - previous);
                previous = line;
            }
            None => out.push(0x80 | (NO_LINE << 3) | len_bits),
        }
        i += run;
    }
    out
}

/// Decode a line table into one entry per code word.
///
/// # Errors
///
/// Returns an error for unknown entry codes, truncated varints or lines that
/// leave the `u32` range.
pub fn decode(first_line: u32, table: &[u8]) -> Result<Vec<Option<u32>>, DecodeError> {
    let mut lines = Vec::new();
    let mut previous = i64::from(first_line);
    let mut pos = 0;
    while pos < table.len() {
        let header = table[pos];
        pos += 1;
        if header & 0x80 == 0 {
            return Err(DecodeError::LineTable("entry without header"));
        }
        let code = (header >> 3) & 0x0F;
        let len = usize::from(header & 0x07) + 1;
        let line = match code {
            LINE_DELTA => {
                previous += read_signed_varint(table, &mut pos)?;
                Some(u32::try_from(previous).map_err(|_| DecodeError::LineTable("line out of range"))?)
            }
            NO_LINE => None,
            _ => return Err(DecodeError::LineTable("unknown entry code")),
        };
        lines.extend(std::iter::repeat_n(line, len));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_runs_split_into_entries() {
        let lines = vec![Some(4); 20];
        let table = encode(1, &lines);
        // 8 + 8 + 4 words: three headers, the first with a delta of 3.
        assert_eq!(table.iter().filter(|b| *b & 0x80 != 0).count(), 3);
        assert_eq!(decode(1, &table).unwrap(), lines);
    }

    #[test]
    fn test_negative_deltas_and_gaps() {
        let lines = vec![Some(10), Some(10), None, Some(2), Some(300), Some(299)];
        let table = encode(5, &lines);
        assert_eq!(decode(5, &table).unwrap(), lines);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(decode(1, &[0x01]).is_err());
        assert!(decode(1, &[0x80 | (3 << 3)]).is_err());
        assert!(decode(1, &[0x80 | (LINE_DELTA << 3), 0x40]).is_err());
    }
}
