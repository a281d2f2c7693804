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
//! # the bucket directory
//!
//! The header is small relative to the body (roughly one u64 offset and one
//! 16-byte value per page, amortized over ~255 records a page), so it is
//! simply rewritten whole on every save rather than updated incrementally.
//!
use codec::{self, LINE_LEN};
use error::{SpotError, SpotResult};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

/// per-bucket metadata: the token hashes colliding into this bucket and the
/// linked list of pages holding their records
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bucket {
    /// this bucket's id, `hash64(token) % num_buckets`
    pub id: u64,
    /// token hashes mapped here; position is the record disambiguator
    pub tokens: Vec<u64>,
    /// byte offsets, in bucket order, of every page in this bucket's list
    pub page_offsets: Vec<u64>,
    /// first record of each page, parallel to `page_offsets`, for routing inserts
    pub page_values: Vec<[u8; LINE_LEN]>,
}

impl Bucket {
    /// a freshly created bucket with one page at `first_page_offset`
    pub fn new(id: u64, first_page_offset: u64) -> Bucket {
        Bucket {
            id,
            tokens: Vec::new(),
            page_offsets: vec![first_page_offset],
            page_values: vec![[0u8; LINE_LEN]],
        }
    }

    /// position of `hash` among this bucket's known tokens, if present
    pub fn token_index(&self, hash: u64) -> Option<usize> {
        self.tokens.iter().position(|t| *t == hash)
    }

    /// record `hash` as a new colliding token and return its disambiguator
    pub fn add_token(&mut self, hash: u64) -> SpotResult<u16> {
        if self.tokens.len() >= codec::MAX_COLLISIONS_PER_BUCKET {
            return Err(SpotError::BucketOverflow);
        }
        self.tokens.push(hash);
        Ok((self.tokens.len() - 1) as u16)
    }

    /// index of the page whose range should contain `line`: the highest
    /// index `i` with `page_values[i] <= line`, clamped to 0
    pub fn page_index_for(&self, line: &[u8; LINE_LEN]) -> usize {
        // right-biased binary search (like Python's bisect.bisect), then step
        // back one and clamp, matching spec.md §4.6 step 6
        let pos = match self.page_values.binary_search(line) {
            Ok(i) => i + 1,
            Err(i) => i,
        };
        pos.saturating_sub(1)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.write_u64::<BigEndian>(self.id).unwrap();
        encode_u64_list(&self.tokens, out);
        encode_u64_list(&self.page_offsets, out);
        encode_line_list(&self.page_values, out);
    }

    fn decode(cursor: &mut Cursor<&[u8]>) -> SpotResult<Bucket> {
        let id = read_u64(cursor)?;
        let tokens = decode_u64_list(cursor)?;
        let page_offsets = decode_u64_list(cursor)?;
        let page_values = decode_line_list(cursor)?;
        if page_offsets.len() != page_values.len() || page_offsets.is_empty() {
            return Err(SpotError::CorruptHeader(format!(
                "bucket {} has {} page offsets but {} page values",
                id, page_offsets.len(), page_values.len())));
        }
        Ok(Bucket { id, tokens, page_offsets, page_values })
    }
}

/// the in-memory bucket directory, persisted as `header.spot`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// fixed number of hash buckets, set at creation time
    pub num_buckets: u64,
    /// running count of insertions, advisory only
    pub num_insertions: u64,
    /// authoritative size of the body file; may lead the filesystem's view
    pub bodysize: u64,
    /// buckets that have received at least one record
    pub buckets: BTreeMap<u64, Bucket>,
}

impl Header {
    /// a fresh, empty header
    pub fn new(num_buckets: u64) -> Header {
        Header { num_buckets, num_insertions: 0, bodysize: 0, buckets: BTreeMap::new() }
    }

    /// serialize the whole header
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u64::<BigEndian>(self.num_buckets).unwrap();
        out.write_u64::<BigEndian>(self.num_insertions).unwrap();
        out.write_u64::<BigEndian>(self.bodysize).unwrap();

        // outer map length, then the length-prefixed key array, then each
        // bucket in key order — mirrors the reference Python encoding exactly
        out.write_u64::<BigEndian>(self.buckets.len() as u64).unwrap();
        let keys: Vec<u64> = self.buckets.keys().cloned().collect();
        encode_u64_list(&keys, &mut out);
        for key in &keys {
            self.buckets[key].encode(&mut out);
        }
        out
    }

    /// parse a header previously produced by `encode`
    pub fn decode(data: &[u8]) -> SpotResult<Header> {
        let mut cursor = Cursor::new(data);
        let num_buckets = read_u64(&mut cursor)?;
        let num_insertions = read_u64(&mut cursor)?;
        let bodysize = read_u64(&mut cursor)?;
        let bucket_count = read_u64(&mut cursor)? as usize;

        let keys = decode_u64_list(&mut cursor)?;
        if keys.len() != bucket_count {
            return Err(SpotError::CorruptHeader(format!(
                "bucket count {} does not match key array length {}", bucket_count, keys.len())));
        }

        let mut buckets = BTreeMap::new();
        for key in &keys {
            let bucket = Bucket::decode(&mut cursor)?;
            if bucket.id != *key {
                return Err(SpotError::CorruptHeader(format!(
                    "bucket key {} does not match encoded id {}", key, bucket.id)));
            }
            buckets.insert(*key, bucket);
        }

        if num_buckets == 0 {
            return Err(SpotError::CorruptHeader("num_buckets is zero".to_string()));
        }

        Ok(Header { num_buckets, num_insertions, bodysize, buckets })
    }
}

fn read_u64(cursor: &mut Cursor<&[u8]>) -> SpotResult<u64> {
    cursor.read_u64::<BigEndian>().map_err(|e| SpotError::CorruptHeader(e.to_string()))
}

fn encode_u64_list(values: &[u64], out: &mut Vec<u8>) {
    out.write_u64::<BigEndian>(values.len() as u64).unwrap();
    for v in values {
        out.write_u64::<BigEndian>(*v).unwrap();
    }
}

fn decode_u64_list(cursor: &mut Cursor<&[u8]>) -> SpotResult<Vec<u64>> {
    let len = read_u64(cursor)? as usize;
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        values.push(read_u64(cursor)?);
    }
    Ok(values)
}

fn encode_line_list(values: &[[u8; LINE_LEN]], out: &mut Vec<u8>) {
    out.write_u64::<BigEndian>(values.len() as u64).unwrap();
    for v in values {
        out.extend_from_slice(v);
    }
}

fn decode_line_list(cursor: &mut Cursor<&[u8]>) -> SpotResult<Vec<[u8; LINE_LEN]>> {
    let len = read_u64(cursor)? as usize;
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        let mut buf = [0u8; LINE_LEN];
        cursor.read_exact(&mut buf).map_err(|e| SpotError::CorruptHeader(e.to_string()))?;
        values.push(buf);
    }
    Ok(values)
}

#[cfg(test)]
mod test {
    use super::*;
    use codec::encode_line;

    #[test]
    fn empty_header_round_trip() {
        let header = Header::new(4096);
        let encoded = header.encode();
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn header_with_buckets_round_trip() {
        let mut header = Header::new(16);
        header.num_insertions = 3;
        header.bodysize = 4096 * 2;

        let mut bucket = Bucket::new(5, 0);
        let disamb = bucket.add_token(0xdead_beef).unwrap();
        assert_eq!(disamb, 0);
        bucket.page_values[0] = encode_line(0, 0, 0).unwrap();
        bucket.page_offsets.push(4096);
        bucket.page_values.push(encode_line(9, 9, 0).unwrap());
        header.buckets.insert(5, bucket);

        let encoded = header.encode();
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn decode_rejects_truncated_data() {
        let header = Header::new(4096);
        let mut encoded = header.encode();
        encoded.truncate(encoded.len() - 4);
        assert!(Header::decode(&encoded).is_err());
    }

    #[test]
    fn page_index_for_picks_highest_le() {
        let mut bucket = Bucket::new(0, 0);
        bucket.page_values = vec![
            encode_line(0, 0, 0).unwrap(),
            encode_line(10, 0, 0).unwrap(),
            encode_line(20, 0, 0).unwrap(),
        ];
        bucket.page_offsets = vec![0, 4096, 8192];

        assert_eq!(bucket.page_index_for(&encode_line(0, 0, 0).unwrap()), 0);
        assert_eq!(bucket.page_index_for(&encode_line(5, 0, 0).unwrap()), 0);
        assert_eq!(bucket.page_index_for(&encode_line(10, 0, 0).unwrap()), 1);
        assert_eq!(bucket.page_index_for(&encode_line(25, 0, 0).unwrap()), 2);
    }

    #[test]
    fn add_token_rejects_past_collision_cap() {
        let mut bucket = Bucket::new(0, 0);
        for i in 0..codec::MAX_COLLISIONS_PER_BUCKET as u64 {
            bucket.add_token(i).unwrap();
        }
        assert!(bucket.add_token(999_999).is_err());
    }
}
