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
//! # a page of the body file
//!
//! A page holds a sorted run of fixed-width 16-byte records plus a link to
//! the next page in its bucket's linked list.
//!
//! <pre>
//! +--------+-------------------------------+---------+
//! | header | records (sorted, 16B each)    | padding |
//! +--------+-------------------------------+---------+
//! header: length:u56 ‖ ' ' ‖ next_page_offset:u56 ‖ '\n'  (16 bytes)
//! padding: '~' bytes to the end of the page
//! </pre>
//!
use codec::{decode_line, decode_page_header, encode_page_header, LINE_LEN, PAGE_HEADER_LEN};
use error::{SpotError, SpotResult};

/// an in-memory view of one disk page
#[derive(Clone, Debug)]
pub struct Page {
    /// byte offset of this page within the body file; immutable after allocation
    pub offset: u64,
    /// byte offset of the next page in this page's bucket, 0 if none
    pub next_page: u64,
    /// sorted 16-byte records held by this page
    pub lines: Vec<[u8; LINE_LEN]>,
    /// the configured page size this page was built for
    page_size: usize,
    /// true if this page has unwritten changes
    pub dirty: bool,
}

impl Page {
    /// number of 16-byte records that fit in a page of the given size
    pub fn capacity(page_size: usize) -> usize {
        (page_size - PAGE_HEADER_LEN) / LINE_LEN
    }

    /// create a new, empty page to be written at `offset`
    pub fn new_empty(offset: u64, page_size: usize) -> Page {
        Page { offset, next_page: 0, lines: Vec::new(), page_size, dirty: true }
    }

    /// parse a page from a page-sized buffer read from `offset`
    pub fn decode(buf: &[u8], offset: u64, page_size: usize) -> SpotResult<Page> {
        if buf.len() != page_size {
            return Err(SpotError::CorruptPage(format!(
                "expected {} bytes, got {}", page_size, buf.len())));
        }
        let (length, next_page) = decode_page_header(&buf[0..PAGE_HEADER_LEN])?;
        if length as usize % LINE_LEN != 0 {
            return Err(SpotError::CorruptPage(format!("length {} not a multiple of {}", length, LINE_LEN)));
        }
        let record_count = length as usize / LINE_LEN;
        if PAGE_HEADER_LEN + record_count * LINE_LEN > page_size {
            return Err(SpotError::CorruptPage("page length field exceeds page capacity".to_string()));
        }
        let mut lines = Vec::with_capacity(record_count);
        for i in 0..record_count {
            let start = PAGE_HEADER_LEN + i * LINE_LEN;
            let mut line = [0u8; LINE_LEN];
            line.copy_from_slice(&buf[start..start + LINE_LEN]);
            lines.push(line);
        }
        Ok(Page { offset, next_page, lines, page_size, dirty: false })
    }

    /// serialize this page to a page-sized buffer: header + records + `~` padding
    pub fn encode(&self) -> SpotResult<Vec<u8>> {
        let length = (self.lines.len() * LINE_LEN) as u64;
        if PAGE_HEADER_LEN + self.lines.len() * LINE_LEN > self.page_size {
            return Err(SpotError::CorruptPage("page contents overflow page size".to_string()));
        }
        let mut buf = vec![b'~'; self.page_size];
        buf[0..PAGE_HEADER_LEN].copy_from_slice(&encode_page_header(length, self.next_page)?);
        for (i, line) in self.lines.iter().enumerate() {
            let start = PAGE_HEADER_LEN + i * LINE_LEN;
            buf[start..start + LINE_LEN].copy_from_slice(line);
        }
        Ok(buf)
    }

    /// true if inserting one more record would overflow this page
    pub fn is_full(&self) -> bool {
        (self.lines.len() + 1) * LINE_LEN + PAGE_HEADER_LEN > self.page_size
    }

    /// insert `line` preserving sorted byte order; caller must have already
    /// checked `is_full()` and split if necessary
    pub fn insert_line(&mut self, line: [u8; LINE_LEN]) {
        let idx = match self.lines.binary_search(&line) {
            Ok(i) => i,
            Err(i) => i,
        };
        self.lines.insert(idx, line);
        self.dirty = true;
    }

    /// split this page's records roughly in half, returning the right half.
    /// the caller is responsible for allocating the new page and wiring up
    /// `next_page` links and bucket metadata.
    pub fn split_off_right_half(&mut self) -> Vec<[u8; LINE_LEN]> {
        let n = self.lines.len();
        let right = self.lines.split_off(n / 2);
        self.dirty = true;
        right
    }

    /// the first record's `(value, docid, disambiguator)` tuple, if any
    pub fn first_line(&self) -> Option<[u8; LINE_LEN]> {
        self.lines.first().cloned()
    }

    /// decode all records for callers that already know the page's records are valid
    pub fn decoded_lines(&self) -> Vec<(u64, u64, u16)> {
        self.lines.iter().map(|l| decode_line(l)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use codec::encode_line;

    const PAGE_SIZE: usize = 4096;

    #[test]
    fn round_trip_empty_page() {
        let page = Page::new_empty(0, PAGE_SIZE);
        let encoded = page.encode().unwrap();
        let decoded = Page::decode(&encoded, 0, PAGE_SIZE).unwrap();
        assert_eq!(decoded.lines.len(), 0);
        assert_eq!(decoded.next_page, 0);
    }

    #[test]
    fn round_trip_with_records() {
        let mut page = Page::new_empty(4096, PAGE_SIZE);
        page.next_page = 8192;
        page.insert_line(encode_line(5, 1, 0).unwrap());
        page.insert_line(encode_line(2, 0, 0).unwrap());
        page.insert_line(encode_line(5, 2, 0).unwrap());

        let encoded = page.encode().unwrap();
        let decoded = Page::decode(&encoded, 4096, PAGE_SIZE).unwrap();
        assert_eq!(decoded.lines, page.lines);
        assert_eq!(decoded.next_page, 8192);
        assert_eq!(decoded.decoded_lines(), vec![(2, 0, 0), (5, 1, 0), (5, 2, 0)]);
    }

    #[test]
    fn insert_keeps_sorted_order() {
        let mut page = Page::new_empty(0, PAGE_SIZE);
        for (v, d) in &[(3, 0), (1, 0), (2, 0), (1, 1)] {
            page.insert_line(encode_line(*v, *d, 0).unwrap());
        }
        let sorted: Vec<[u8; LINE_LEN]> = {
            let mut l = page.lines.clone();
            l.sort();
            l
        };
        assert_eq!(page.lines, sorted);
    }

    #[test]
    fn capacity_matches_spec_budget() {
        assert_eq!(Page::capacity(4096), 255);
    }

    #[test]
    fn is_full_at_capacity() {
        let mut page = Page::new_empty(0, PAGE_SIZE);
        for i in 0..Page::capacity(PAGE_SIZE) {
            assert!(!page.is_full());
            page.insert_line(encode_line(i as u64, 0, 0).unwrap());
        }
        assert!(page.is_full());
    }

    #[test]
    fn decode_rejects_oversized_length_field() {
        let mut buf = vec![b'~'; PAGE_SIZE];
        buf[0..PAGE_HEADER_LEN].copy_from_slice(&encode_page_header(PAGE_SIZE as u64 * 2, 0).unwrap());
        assert!(Page::decode(&buf, 0, PAGE_SIZE).is_err());
    }
}
