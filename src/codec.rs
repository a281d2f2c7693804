//
// Copyright 2018 Tamas Blummer
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
//!
//! # Fixed-width codec
//!
//! Records ("lines") are kept sorted by raw byte comparison, so lexicographic
//! byte order must equal `(value, docid, disambiguator)` tuple order. That
//! only holds if every field is big-endian and occupies whole bytes.
//!
use error::{SpotError, SpotResult};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// width in bytes of one stored record
pub const LINE_LEN: usize = 16;
/// width in bytes of the page header (length ‖ ' ' ‖ next_page ‖ '\n')
pub const PAGE_HEADER_LEN: usize = 16;

/// largest value a `value` field may hold (top value is reserved as a sentinel)
pub const MAX_VALUE: u64 = (1u64 << 56) - 2;
/// largest docid a `docid` field may hold
pub const MAX_DOCID: u64 = (1u64 << 56) - 1;
/// largest number of distinct colliding tokens a single bucket may hold
pub const MAX_COLLISIONS_PER_BUCKET: usize = 65535;

const U56_BYTES: usize = 7;

/// encode an unsigned value into 7 big-endian bytes
pub fn encode_u56(x: u64) -> SpotResult<[u8; 7]> {
    if x >= (1u64 << 56) {
        return Err(SpotError::InvalidArgument(format!("{} does not fit in 56 bits", x)));
    }
    let mut buf = [0u8; 7];
    {
        let mut cursor = Cursor::new(&mut buf[..]);
        cursor.write_uint::<BigEndian>(x, U56_BYTES).unwrap();
    }
    Ok(buf)
}

/// decode an unsigned value from 7 big-endian bytes
pub fn decode_u56(bytes: &[u8]) -> u64 {
    let mut cursor = Cursor::new(bytes);
    cursor.read_uint::<BigEndian>(U56_BYTES).unwrap()
}

/// encode an unsigned value into 2 big-endian bytes
pub fn encode_u16(x: u16) -> [u8; 2] {
    let mut buf = [0u8; 2];
    {
        let mut cursor = Cursor::new(&mut buf[..]);
        cursor.write_u16::<BigEndian>(x).unwrap();
    }
    buf
}

/// decode an unsigned value from 2 big-endian bytes
pub fn decode_u16(bytes: &[u8]) -> u16 {
    let mut cursor = Cursor::new(bytes);
    cursor.read_u16::<BigEndian>().unwrap()
}

/// encode a 16-byte record: `value:u56 ‖ docid:u56 ‖ disambiguator:u16`
pub fn encode_line(value: u64, docid: u64, disambiguator: u16) -> SpotResult<[u8; LINE_LEN]> {
    if value > MAX_VALUE {
        return Err(SpotError::InvalidArgument(format!("value {} exceeds MAX_VALUE", value)));
    }
    if docid > MAX_DOCID {
        return Err(SpotError::InvalidArgument(format!("docid {} exceeds MAX_DOCID", docid)));
    }
    let mut line = [0u8; LINE_LEN];
    line[0..7].copy_from_slice(&encode_u56(value)?);
    line[7..14].copy_from_slice(&encode_u56(docid)?);
    line[14..16].copy_from_slice(&encode_u16(disambiguator));
    Ok(line)
}

/// decode a 16-byte record back into `(value, docid, disambiguator)`
pub fn decode_line(line: &[u8]) -> (u64, u64, u16) {
    debug_assert_eq!(line.len(), LINE_LEN);
    let value = decode_u56(&line[0..7]);
    let docid = decode_u56(&line[7..14]);
    let disambiguator = decode_u16(&line[14..16]);
    (value, docid, disambiguator)
}

/// encode a 16-byte page header: `length:u56 ‖ ' ' ‖ next_page_offset:u56 ‖ '\n'`
pub fn encode_page_header(length: u64, next_page_offset: u64) -> SpotResult<[u8; PAGE_HEADER_LEN]> {
    let mut buf = [0u8; PAGE_HEADER_LEN];
    buf[0..7].copy_from_slice(&encode_u56(length)?);
    buf[7] = b' ';
    buf[8..15].copy_from_slice(&encode_u56(next_page_offset)?);
    buf[15] = b'\n';
    Ok(buf)
}

/// decode a 16-byte page header; rejects the alternative one-byte-disambiguator
/// layout some historical versions of this format used (see design notes)
pub fn decode_page_header(bytes: &[u8]) -> SpotResult<(u64, u64)> {
    if bytes.len() < PAGE_HEADER_LEN {
        return Err(SpotError::CorruptPage("page header truncated".to_string()));
    }
    if bytes[7] != b' ' || bytes[15] != b'\n' {
        return Err(SpotError::CorruptPage("page header delimiter mismatch".to_string()));
    }
    let length = decode_u56(&bytes[0..7]);
    let next_page_offset = decode_u56(&bytes[8..15]);
    Ok((length, next_page_offset))
}

#[cfg(test)]
mod test {
    extern crate hex;

    use super::*;

    #[test]
    fn u56_roundtrip() {
        for x in &[0u64, 1, 255, 256, 1 << 40, (1u64 << 56) - 1] {
            let enc = encode_u56(*x).unwrap();
            assert_eq!(decode_u56(&enc), *x);
        }
    }

    #[test]
    fn u56_rejects_overflow() {
        assert!(encode_u56(1u64 << 56).is_err());
    }

    #[test]
    fn line_roundtrip() {
        let line = encode_line(7, 42, 3).unwrap();
        assert_eq!(decode_line(&line), (7, 42, 3));
    }

    #[test]
    fn line_hex_is_stable_across_reencoding() {
        let line = encode_line(200, 9001, 3).unwrap();
        let (value, docid, disambiguator) = decode_line(&line);
        let reencoded = encode_line(value, docid, disambiguator).unwrap();
        assert_eq!(hex::encode(&line[..]), hex::encode(&reencoded[..]));
    }

    #[test]
    fn line_sorts_lexicographically_like_tuples() {
        let a = encode_line(3, 9, 0).unwrap();
        let b = encode_line(3, 10, 0).unwrap();
        let c = encode_line(4, 0, 0).unwrap();
        assert!(a.as_ref() < b.as_ref());
        assert!(b.as_ref() < c.as_ref());
    }

    #[test]
    fn page_header_roundtrip() {
        let header = encode_page_header(240, 8192).unwrap();
        assert_eq!(decode_page_header(&header).unwrap(), (240, 8192));
    }

    #[test]
    fn page_header_rejects_bad_delimiters() {
        let mut header = encode_page_header(0, 0).unwrap();
        header[7] = b'x';
        assert!(decode_page_header(&header).is_err());
    }

    #[test]
    fn encode_line_rejects_out_of_range_value() {
        assert!(encode_line(MAX_VALUE + 1, 0, 0).is_err());
    }

    #[test]
    fn encode_line_rejects_out_of_range_docid() {
        assert!(encode_line(0, MAX_DOCID + 1, 0).is_err());
    }
}
