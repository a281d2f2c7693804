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
//! # the index
//!
//! Wires the header (bucket directory), the page manager (cached body
//! file access) and the codec together behind the insert and query API.
//! An index lives in a directory holding two files: `header.spot` and
//! `body.spot`.
//!
use codec::{self, encode_line};
use error::{SpotError, SpotResult};
use hashing;
use header::{Bucket, Header};
use index_registry;
use nodes::{AndNode, AndWithNegations, EmptyNode, Node, OrNode, TokenNode};
use options::IndexOptions;
use page::Page;
use page_manager::PageManager;

use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const HEADER_FILE: &str = "header.spot";
const BODY_FILE: &str = "body.spot";

/// an open, embedded inverted index
pub struct Index {
    id: u64,
    header: Header,
    page_manager: PageManager,
    header_path: PathBuf,
}

impl Index {
    /// open (creating if necessary) the index rooted at `path` with default options
    pub fn open<P: AsRef<Path>>(path: P) -> SpotResult<Index> {
        Index::open_with_options(path, IndexOptions::default())
    }

    /// open (creating if necessary) the index rooted at `path`; `options` is
    /// only honored the first time a path is created
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: IndexOptions) -> SpotResult<Index> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;
        let header_path = path.join(HEADER_FILE);
        let body_path = path.join(BODY_FILE);

        let header = if header_path.exists() {
            let mut buf = Vec::new();
            File::open(&header_path)?.read_to_end(&mut buf)?;
            Header::decode(&buf)?
        } else {
            Header::new(options.num_buckets)
        };

        let body_file = OpenOptions::new().read(true).write(true).create(true).open(&body_path)?;
        let page_manager = PageManager::open(body_file, options.page_size, options.max_resident_pages)?;

        debug!("opened index at {:?}: {} buckets, {} insertions", path, header.num_buckets, header.num_insertions);

        Ok(Index { id: index_registry::next_index_id(), header, page_manager, header_path })
    }

    /// this index's process-local identifier, stamped into serialized cursors
    pub fn id(&self) -> u64 {
        self.id
    }

    /// fixed number of hash buckets this index was created with
    pub fn num_buckets(&self) -> u64 {
        self.header.num_buckets
    }

    /// the bucket directory, for callers building query nodes directly
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// fetch (and cache) the page at `offset`; used by query nodes
    pub fn fetch_page(&mut self, offset: u64) -> SpotResult<&mut Page> {
        self.page_manager.fetch_page(offset)
    }

    /// persist the header and every dirty resident page
    pub fn save(&mut self) -> SpotResult<()> {
        self.page_manager.save_all()?;
        self.header.bodysize = self.page_manager.filesize();
        let encoded = self.header.encode();
        let mut f = File::create(&self.header_path)?;
        f.write_all(&encoded)?;
        f.flush()?;
        Ok(())
    }

    /// post one `(value, docid)` posting under `token`, creating the bucket
    /// and registering the token hash on first sight
    pub fn add(&mut self, token: &str, docid: u64, value: u64) -> SpotResult<()> {
        if token.is_empty() {
            return Err(SpotError::InvalidArgument("token must not be empty; use add_doc for the reserved bucket".to_string()));
        }
        self.insert_under(token, docid, value)
    }

    /// record `docid` in the reserved "all documents" bucket, so that a
    /// query for the empty-string token enumerates every document
    pub fn add_doc(&mut self, docid: u64, value: u64) -> SpotResult<()> {
        self.insert_under("", docid, value)
    }

    fn insert_under(&mut self, token: &str, docid: u64, value: u64) -> SpotResult<()> {
        if value > codec::MAX_VALUE {
            return Err(SpotError::InvalidArgument(format!("value {} exceeds MAX_VALUE", value)));
        }
        if docid > codec::MAX_DOCID {
            return Err(SpotError::InvalidArgument(format!("docid {} exceeds MAX_DOCID", docid)));
        }
        self.header.num_insertions += 1;

        let hash = hashing::hash64(token);
        let bucket_id = hash % self.header.num_buckets;

        if !self.header.buckets.contains_key(&bucket_id) {
            let first_page = self.page_manager.allocate_page()?;
            self.header.buckets.insert(bucket_id, Bucket::new(bucket_id, first_page));
        }

        let disambiguator = {
            let bucket = self.header.buckets.get_mut(&bucket_id).expect("just inserted");
            match bucket.token_index(hash) {
                Some(i) => i as u16,
                None => bucket.add_token(hash)?,
            }
        };

        let line = encode_line(value, docid, disambiguator)?;
        self.insert_line_into_bucket(bucket_id, line)
    }

    fn insert_line_into_bucket(&mut self, bucket_id: u64, line: [u8; codec::LINE_LEN]) -> SpotResult<()> {
        let page_idx = self.header.buckets[&bucket_id].page_index_for(&line);
        let page_offset = self.header.buckets[&bucket_id].page_offsets[page_idx];

        let needs_split = {
            let page = self.page_manager.fetch_page(page_offset)?;
            page.is_full()
        };

        if needs_split {
            self.split_page(bucket_id, page_idx)?;
            // recompute: the record may now belong on either side of the split
            return self.insert_line_into_bucket(bucket_id, line);
        }

        let page = self.page_manager.fetch_page(page_offset)?;
        page.insert_line(line);
        let new_first = page.first_line().expect("just inserted a line");

        let bucket = self.header.buckets.get_mut(&bucket_id).expect("bucket exists");
        bucket.page_values[page_idx] = new_first;
        Ok(())
    }

    fn split_page(&mut self, bucket_id: u64, page_idx: usize) -> SpotResult<()> {
        let page_offset = self.header.buckets[&bucket_id].page_offsets[page_idx];
        let right_half = {
            let page = self.page_manager.fetch_page(page_offset)?;
            page.split_off_right_half()
        };
        let right_first = right_half[0];

        let new_offset = self.page_manager.allocate_page()?;
        {
            let new_page = self.page_manager.fetch_page(new_offset)?;
            for line in right_half {
                new_page.insert_line(line);
            }
        }

        let old_next = {
            let page = self.page_manager.fetch_page(page_offset)?;
            let old_next = page.next_page;
            page.next_page = new_offset;
            old_next
        };
        self.page_manager.fetch_page(new_offset)?.next_page = old_next;

        let bucket = self.header.buckets.get_mut(&bucket_id).expect("bucket exists");
        bucket.page_offsets.insert(page_idx + 1, new_offset);
        bucket.page_values.insert(page_idx + 1, right_first);
        debug!("split bucket {} page {} at offset {}", bucket_id, page_idx, page_offset);
        Ok(())
    }

    /// a node scanning every posting for `token`
    pub fn documents_with_token(&self, token: &str) -> Box<dyn Node> {
        Box::new(TokenNode::new(self, token))
    }

    /// a node scanning every document ever added via `add_doc`
    pub fn all_documents(&self) -> Box<dyn Node> {
        self.documents_with_token("")
    }

    /// intersection of one node per token; `EmptyNode` if `tokens` is empty
    pub fn and_query(&self, tokens: &[&str]) -> Box<dyn Node> {
        if tokens.is_empty() {
            return Box::new(EmptyNode::new());
        }
        let children: Vec<Box<dyn Node>> = tokens.iter().map(|t| self.documents_with_token(t)).collect();
        if children.len() == 1 {
            return children.into_iter().next().unwrap();
        }
        Box::new(AndNode::new(children))
    }

    /// union of one node per token; `EmptyNode` if `tokens` is empty
    pub fn or_query(&self, tokens: &[&str]) -> Box<dyn Node> {
        if tokens.is_empty() {
            return Box::new(EmptyNode::new());
        }
        let children: Vec<Box<dyn Node>> = tokens.iter().map(|t| self.documents_with_token(t)).collect();
        if children.len() == 1 {
            return children.into_iter().next().unwrap();
        }
        Box::new(OrNode::new(children))
    }

    /// documents matching every token in `required` and none in `excluded`
    pub fn and_not_query(&self, required: &[&str], excluded: &[&str]) -> SpotResult<Box<dyn Node>> {
        if required.is_empty() {
            return Err(SpotError::InvalidArgument("and_not_query requires at least one required token".to_string()));
        }
        let positive: Vec<Box<dyn Node>> = required.iter().map(|t| self.documents_with_token(t)).collect();
        let negated: Vec<Box<dyn Node>> = excluded.iter().map(|t| self.documents_with_token(t)).collect();
        Ok(Box::new(AndWithNegations::new(positive, negated)?))
    }

    /// intersect `operands`, where each `bool` marks its node as negated; if
    /// every operand is negated, `all_documents` is implicitly ANDed in so
    /// the query still has a positive driver
    pub fn and(&self, mut operands: Vec<(Box<dyn Node>, bool)>) -> SpotResult<Box<dyn Node>> {
        if operands.is_empty() {
            return Err(SpotError::InvalidArgument("AND requires at least one operand".to_string()));
        }
        if operands.iter().all(|(_, negated)| *negated) {
            operands.push((self.all_documents(), false));
        }
        let mut positive = Vec::new();
        let mut negated = Vec::new();
        for (node, is_negated) in operands {
            if is_negated {
                negated.push(node);
            } else {
                positive.push(node);
            }
        }
        if negated.is_empty() {
            return Ok(if positive.len() == 1 {
                positive.into_iter().next().unwrap()
            } else {
                Box::new(AndNode::new(positive))
            });
        }
        Ok(Box::new(AndWithNegations::new(positive, negated)?))
    }

    /// union `nodes`
    pub fn or(&self, nodes: Vec<Box<dyn Node>>) -> SpotResult<Box<dyn Node>> {
        if nodes.is_empty() {
            return Err(SpotError::InvalidArgument("OR requires at least one operand".to_string()));
        }
        Ok(if nodes.len() == 1 {
            nodes.into_iter().next().unwrap()
        } else {
            Box::new(OrNode::new(nodes))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nodes::{retrieve, Retrieval, LAST};
    use tempfile::tempdir;

    fn scratch() -> (Index, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        (Index::open(dir.path()).unwrap(), dir)
    }

    fn drain(node: &mut dyn Node, idx: &mut Index) -> Vec<(u64, u64)> {
        match retrieve(node, idx, usize::max_value()).unwrap() {
            Retrieval::Done(v) => v,
            Retrieval::Partial(..) => panic!("expected exhaustion"),
        }
    }

    #[test]
    fn insert_then_scan_single_token() {
        let (mut idx, _dir) = scratch();
        idx.add("hello", 100, 1).unwrap();
        idx.add("hello", 200, 2).unwrap();
        let mut node = idx.documents_with_token("hello");
        assert_eq!(drain(node.as_mut(), &mut idx), vec![(1, 100), (2, 200)]);
    }

    #[test]
    fn unknown_token_is_empty() {
        let (mut idx, _dir) = scratch();
        idx.add("hello", 100, 1).unwrap();
        let mut node = idx.documents_with_token("nope");
        assert_eq!(node.step(&mut idx).unwrap(), LAST);
    }

    #[test]
    fn add_rejects_the_reserved_empty_token() {
        let (mut idx, _dir) = scratch();
        assert!(idx.add("", 0, 0).is_err());
    }

    #[test]
    fn and_query_intersects_across_tokens() {
        let (mut idx, _dir) = scratch();
        for docid in &[1u64, 2, 3, 4] {
            idx.add("rust", *docid, *docid).unwrap();
        }
        for docid in &[2u64, 4, 6] {
            idx.add("async", *docid, *docid).unwrap();
        }
        let mut node = idx.and_query(&["rust", "async"]);
        let got = drain(node.as_mut(), &mut idx);
        assert_eq!(got, vec![(2, 2), (4, 4)]);
    }

    #[test]
    fn or_query_unions_across_tokens() {
        let (mut idx, _dir) = scratch();
        idx.add("rust", 1, 1).unwrap();
        idx.add("async", 2, 2).unwrap();
        let mut node = idx.or_query(&["rust", "async"]);
        let got = drain(node.as_mut(), &mut idx);
        assert_eq!(got, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn and_not_query_excludes_negated_matches() {
        let (mut idx, _dir) = scratch();
        for docid in &[1u64, 2, 3] {
            idx.add("rust", docid, docid).unwrap();
        }
        idx.add("deprecated", 2, 2).unwrap();
        let mut node = idx.and_not_query(&["rust"], &["deprecated"]).unwrap();
        let got = drain(node.as_mut(), &mut idx);
        assert_eq!(got, vec![(1, 1), (3, 3)]);
    }

    #[test]
    fn generic_and_auto_adds_all_documents_when_every_operand_is_negated() {
        let (mut idx, _dir) = scratch();
        idx.add_doc(1, 1).unwrap();
        idx.add_doc(2, 2).unwrap();
        idx.add_doc(3, 3).unwrap();
        idx.add("rust", 2, 2).unwrap();
        let negated_only = vec![(idx.documents_with_token("rust"), true)];
        let mut node = idx.and(negated_only).unwrap();
        let got = drain(node.as_mut(), &mut idx);
        assert_eq!(got, vec![(1, 1), (3, 3)]);
    }

    #[test]
    fn all_documents_enumerates_add_doc_calls() {
        let (mut idx, _dir) = scratch();
        idx.add_doc(10, 10).unwrap();
        idx.add_doc(20, 20).unwrap();
        idx.add_doc(30, 30).unwrap();
        let mut node = idx.all_documents();
        assert_eq!(drain(node.as_mut(), &mut idx), vec![(10, 10), (20, 20), (30, 30)]);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut idx = Index::open(dir.path()).unwrap();
            idx.add("hello", 100, 1).unwrap();
            idx.add("hello", 200, 2).unwrap();
            idx.save().unwrap();
        }
        let mut idx = Index::open(dir.path()).unwrap();
        let mut node = idx.documents_with_token("hello");
        assert_eq!(drain(node.as_mut(), &mut idx), vec![(1, 100), (2, 200)]);
    }

    #[test]
    fn page_split_keeps_all_records_reachable() {
        let (mut idx, _dir) = scratch();
        // force several splits: default page holds 255 lines
        for docid in 0..300u64 {
            idx.add("many", docid, docid).unwrap();
        }
        let mut node = idx.documents_with_token("many");
        let got = drain(node.as_mut(), &mut idx);
        assert_eq!(got.len(), 300);
        let mut sorted = got.clone();
        sorted.sort();
        assert_eq!(got, sorted, "scan order must already be sorted");
    }

    #[test]
    fn resume_after_partial_retrieval_matches_full_scan() {
        let (mut idx, _dir) = scratch();
        for docid in 0..500u64 {
            idx.add("paged", docid, docid).unwrap();
        }

        let mut node = idx.documents_with_token("paged");
        let (mut collected, state) = match retrieve(node.as_mut(), &mut idx, 100).unwrap() {
            Retrieval::Partial(v, s) => (v, s),
            Retrieval::Done(_) => panic!("expected a partial result at limit 100"),
        };
        let mut resumed = ::nodes::decode_node(&state);
        let rest = drain(resumed.as_mut(), &mut idx);
        collected.extend(rest);

        let mut full_scan = idx.documents_with_token("paged");
        let full = drain(full_scan.as_mut(), &mut idx);
        assert_eq!(collected, full);
    }

    #[test]
    fn hash_collision_disambiguates_by_insertion_order() {
        // two distinct tokens forced into the same bucket by a tiny bucket count
        let options = IndexOptions { num_buckets: 1, ..IndexOptions::default() };
        let dir = tempdir().unwrap();
        let mut idx = Index::open_with_options(dir.path(), options).unwrap();
        idx.add("alpha", 1, 1).unwrap();
        idx.add("beta", 2, 2).unwrap();
        let mut alpha = idx.documents_with_token("alpha");
        let mut beta = idx.documents_with_token("beta");
        assert_eq!(drain(alpha.as_mut(), &mut idx), vec![(1, 1)]);
        assert_eq!(drain(beta.as_mut(), &mut idx), vec![(2, 2)]);
    }

    // --- literal scenarios from the testable-properties list ---

    fn hello_world_index() -> (Index, tempfile::TempDir) {
        let (mut idx, dir) = scratch();
        idx.add("foo", 0, 7).unwrap();
        idx.add("bar", 0, 7).unwrap();
        idx.add("foo", 1, 3).unwrap();
        idx.add("baz", 1, 3).unwrap();
        idx.add("bar", 2, 11).unwrap();
        idx.add("baz", 2, 11).unwrap();
        (idx, dir)
    }

    #[test]
    fn scenario_hello_world_intersection() {
        let (mut idx, _dir) = hello_world_index();
        let mut node = idx.and_query(&["foo", "bar"]);
        assert_eq!(drain(node.as_mut(), &mut idx), vec![(7, 0)]);
    }

    #[test]
    fn scenario_union_with_duplicates() {
        let (mut idx, _dir) = hello_world_index();
        let mut node = idx.or_query(&["foo", "bar"]);
        assert_eq!(drain(node.as_mut(), &mut idx), vec![(3, 1), (7, 0), (11, 2)]);
    }

    #[test]
    fn scenario_negation_with_all_docs() {
        let (mut idx, _dir) = hello_world_index();
        idx.add_doc(0, 7).unwrap();
        idx.add_doc(1, 3).unwrap();
        idx.add_doc(2, 11).unwrap();
        let mut node = idx.and_not_query(&[""], &["foo"]).unwrap();
        assert_eq!(drain(node.as_mut(), &mut idx), vec![(11, 2)]);
    }

    #[test]
    fn scenario_page_split_correctness() {
        let (mut idx, _dir) = scratch();
        for i in 0..300u64 {
            idx.add("t", i, i).unwrap();
        }
        assert!(idx.header().buckets[&(hashing::bucket_id("t", idx.num_buckets()))].page_offsets.len() >= 2);
        let mut node = idx.documents_with_token("t");
        let expected: Vec<(u64, u64)> = (0..300).map(|i| (i, i)).collect();
        assert_eq!(drain(node.as_mut(), &mut idx), expected);
    }
}
