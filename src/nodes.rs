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
//! # query nodes
//!
//! Lazy iterators over sorted `(value, docid)` streams. Every node starts at
//! the sentinel FIRST and is driven forward one step at a time by its owner;
//! it becomes LAST at exhaustion and stays there.
//!
use codec::decode_line;
use error::{SpotError, SpotResult};
use hashing;
use index::Index;

/// smallest possible cursor value, before any real record; lies strictly
/// outside the valid `[0, 2^56)` value domain so no real record can equal it
pub const FIRST_VALUE: i64 = i64::min_value();
/// largest possible cursor value, after every real record; lies strictly
/// outside the valid `[0, 2^56)` value domain so no real record can equal it
pub const LAST_VALUE: i64 = i64::max_value();

/// cursor value: `(ranking value, docid)`, compared lexicographically
pub type Cursor = (i64, i64);

/// the FIRST sentinel, the initial value of every node before its first `step`
pub const FIRST: Cursor = (FIRST_VALUE, 0);
/// the LAST sentinel, emitted at and after exhaustion
pub const LAST: Cursor = (LAST_VALUE, 0);

/// common cursor contract shared by every query node
pub trait Node {
    /// advance to the next satisfying record, or to LAST at exhaustion
    fn step(&mut self, index: &mut Index) -> SpotResult<Cursor>;
    /// the value produced by the most recent `step` (FIRST before the first call)
    fn current(&self) -> Cursor;
    /// capture this node's cursor state so it can be resumed later
    fn encode(&self) -> NodeState;
}

/// serializable node cursor state, tagged by node kind for decode dispatch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// a single posting-list scan
    Token {
        /// the token string, re-hashed on decode to find the right bucket
        token: String,
        /// snapshot of the bucket's page list at construction time
        page_offsets: Vec<u64>,
        /// disambiguator within the bucket, or None if the token is unknown
        disambiguator: Option<u16>,
        /// index into `page_offsets` of the page currently being scanned
        page_idx: usize,
        /// index into the current page's lines, -1 before the first line
        line_idx: i64,
        /// cursor value as of the last step
        current: Cursor,
    },
    /// union of children
    Or {
        /// child cursor states
        children: Vec<NodeState>,
        /// cursor value as of the last step
        current: Cursor,
        /// whether children have been primed with their first step
        started: bool,
    },
    /// intersection of children
    And {
        /// child cursor states
        children: Vec<NodeState>,
        /// cursor value as of the last step
        current: Cursor,
    },
    /// intersection of positive children excluding any value matched by a negated child
    AndNotNode {
        /// positive (required) child cursor states
        positive: Vec<NodeState>,
        /// negated (excluded) child cursor states
        negated: Vec<NodeState>,
        /// cursor value as of the last step
        current: Cursor,
    },
    /// an always-exhausted node
    Empty,
    /// a node backed by a fixed, already-sorted list of values; used in tests
    List {
        /// the sorted values to emit
        values: Vec<Cursor>,
        /// index of the next value to emit
        idx: i64,
    },
}

/// construct a live node from previously captured state
pub fn decode_node(state: &NodeState) -> Box<dyn Node> {
    match state {
        NodeState::Token { token, page_offsets, disambiguator, page_idx, line_idx, current } => {
            Box::new(TokenNode {
                token: token.clone(),
                page_offsets: page_offsets.clone(),
                disambiguator: *disambiguator,
                page_idx: *page_idx,
                line_idx: *line_idx,
                current: *current,
            })
        }
        NodeState::Or { children, current, started } => Box::new(OrNode {
            children: children.iter().map(|c| decode_node(c)).collect(),
            current: *current,
            started: *started,
        }),
        NodeState::And { children, current } => Box::new(AndNode {
            children: children.iter().map(|c| decode_node(c)).collect(),
            current: *current,
        }),
        NodeState::AndNotNode { positive, negated, current } => Box::new(AndWithNegations {
            positive: positive.iter().map(|c| decode_node(c)).collect(),
            negated: negated.iter().map(|c| decode_node(c)).collect(),
            current: *current,
        }),
        NodeState::Empty => Box::new(EmptyNode { current: FIRST }),
        NodeState::List { values, idx } => Box::new(ListNode { values: values.clone(), idx: *idx }),
    }
}

/// scan of a single token's posting list
pub struct TokenNode {
    token: String,
    page_offsets: Vec<u64>,
    disambiguator: Option<u16>,
    page_idx: usize,
    line_idx: i64,
    current: Cursor,
}

impl TokenNode {
    /// build a scan over `token`'s posting list as of the index's current bucket state;
    /// an unknown token yields an immediately-exhausted node
    pub fn new(index: &Index, token: &str) -> TokenNode {
        let h = hashing::hash64(token);
        let bucket_id = h % index.num_buckets();
        match index.header().buckets.get(&bucket_id) {
            Some(bucket) => match bucket.token_index(h) {
                Some(disamb) => TokenNode {
                    token: token.to_string(),
                    page_offsets: bucket.page_offsets.clone(),
                    disambiguator: Some(disamb as u16),
                    page_idx: 0,
                    line_idx: -1,
                    current: FIRST,
                },
                None => TokenNode::exhausted(token),
            },
            None => TokenNode::exhausted(token),
        }
    }

    fn exhausted(token: &str) -> TokenNode {
        TokenNode {
            token: token.to_string(),
            page_offsets: Vec::new(),
            disambiguator: None,
            page_idx: 0,
            line_idx: -1,
            current: FIRST,
        }
    }
}

impl Node for TokenNode {
    fn step(&mut self, index: &mut Index) -> SpotResult<Cursor> {
        if self.current == LAST {
            return Ok(LAST);
        }
        let disamb = match self.disambiguator {
            Some(d) => d,
            None => {
                self.current = LAST;
                return Ok(LAST);
            }
        };
        loop {
            if self.page_idx >= self.page_offsets.len() {
                self.current = LAST;
                return Ok(LAST);
            }
            {
                let page = index.fetch_page(self.page_offsets[self.page_idx])?;
                loop {
                    self.line_idx += 1;
                    if (self.line_idx as usize) >= page.lines.len() {
                        break;
                    }
                    let (value, docid, d) = decode_line(&page.lines[self.line_idx as usize]);
                    if d == disamb {
                        self.current = (value as i64, docid as i64);
                        return Ok(self.current);
                    }
                }
            }
            if self.page_idx == self.page_offsets.len() - 1 {
                self.current = LAST;
                return Ok(LAST);
            }
            self.page_idx += 1;
            self.line_idx = -1;
        }
    }

    fn current(&self) -> Cursor {
        self.current
    }

    fn encode(&self) -> NodeState {
        NodeState::Token {
            token: self.token.clone(),
            page_offsets: self.page_offsets.clone(),
            disambiguator: self.disambiguator,
            page_idx: self.page_idx,
            line_idx: self.line_idx,
            current: self.current,
        }
    }
}

/// k-way merge of sorted children; duplicates across children collapse to one emission
pub struct OrNode {
    children: Vec<Box<dyn Node>>,
    current: Cursor,
    started: bool,
}

impl OrNode {
    /// build a union over `children`; a node with no children is always exhausted
    pub fn new(children: Vec<Box<dyn Node>>) -> OrNode {
        OrNode { children, current: FIRST, started: false }
    }
}

impl Node for OrNode {
    fn step(&mut self, index: &mut Index) -> SpotResult<Cursor> {
        if !self.started {
            for child in self.children.iter_mut() {
                child.step(index)?;
            }
            self.started = true;
        }
        let min = self.children.iter().map(|c| c.current()).min().unwrap_or(LAST);
        if min == LAST {
            self.current = LAST;
            return Ok(LAST);
        }
        self.current = min;
        for child in self.children.iter_mut() {
            if child.current() == min {
                child.step(index)?;
            }
        }
        Ok(self.current)
    }

    fn current(&self) -> Cursor {
        self.current
    }

    fn encode(&self) -> NodeState {
        NodeState::Or {
            children: self.children.iter().map(|c| c.encode()).collect(),
            current: self.current,
            started: self.started,
        }
    }
}

/// intersection of sorted children
pub struct AndNode {
    children: Vec<Box<dyn Node>>,
    current: Cursor,
}

impl AndNode {
    /// build an intersection over `children`; requires at least two children
    pub fn new(children: Vec<Box<dyn Node>>) -> AndNode {
        AndNode { children, current: FIRST }
    }
}

impl Node for AndNode {
    fn step(&mut self, index: &mut Index) -> SpotResult<Cursor> {
        for child in self.children.iter_mut() {
            child.step(index)?;
        }
        loop {
            let high = self.children.iter().map(|c| c.current()).max().unwrap_or(LAST);
            if high == LAST {
                self.current = LAST;
                return Ok(LAST);
            }
            let mut changed = false;
            for child in self.children.iter_mut() {
                if child.current() < high {
                    child.step(index)?;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        self.current = self.children[0].current();
        Ok(self.current)
    }

    fn current(&self) -> Cursor {
        self.current
    }

    fn encode(&self) -> NodeState {
        NodeState::And {
            children: self.children.iter().map(|c| c.encode()).collect(),
            current: self.current,
        }
    }
}

/// intersection of positive children excluding any value a negated child also matches
pub struct AndWithNegations {
    positive: Vec<Box<dyn Node>>,
    negated: Vec<Box<dyn Node>>,
    current: Cursor,
}

impl AndWithNegations {
    /// build a node requiring every positive child to match and no negated child to match;
    /// returns InvalidArgument if there is no positive child
    pub fn new(positive: Vec<Box<dyn Node>>, negated: Vec<Box<dyn Node>>) -> SpotResult<AndWithNegations> {
        if positive.is_empty() {
            return Err(SpotError::InvalidArgument("AndWithNegations requires at least one positive child".to_string()));
        }
        Ok(AndWithNegations { positive, negated, current: FIRST })
    }
}

impl Node for AndWithNegations {
    fn step(&mut self, index: &mut Index) -> SpotResult<Cursor> {
        for child in self.positive.iter_mut() {
            child.step(index)?;
        }
        for child in self.negated.iter_mut() {
            child.step(index)?;
        }
        loop {
            // converge the positive children the way AndNode does
            loop {
                let high = self.positive.iter().map(|c| c.current()).max().unwrap_or(LAST);
                if high == LAST {
                    self.current = LAST;
                    return Ok(LAST);
                }
                let mut changed = false;
                for child in self.positive.iter_mut() {
                    if child.current() < high {
                        child.step(index)?;
                        changed = true;
                    }
                }
                if !changed {
                    break;
                }
            }
            let v = self.positive[0].current();

            for child in self.negated.iter_mut() {
                while child.current() < v {
                    child.step(index)?;
                }
            }

            if self.negated.iter().any(|c| c.current() == v) {
                // v is excluded: push one positive child past it and retry
                self.positive[0].step(index)?;
                continue;
            }

            self.current = v;
            return Ok(self.current);
        }
    }

    fn current(&self) -> Cursor {
        self.current
    }

    fn encode(&self) -> NodeState {
        NodeState::AndNotNode {
            positive: self.positive.iter().map(|c| c.encode()).collect(),
            negated: self.negated.iter().map(|c| c.encode()).collect(),
            current: self.current,
        }
    }
}

/// a node that is always exhausted; used when a query refers to an unknown token
pub struct EmptyNode {
    current: Cursor,
}

impl EmptyNode {
    /// construct an always-exhausted node
    pub fn new() -> EmptyNode {
        EmptyNode { current: FIRST }
    }
}

impl Node for EmptyNode {
    fn step(&mut self, _index: &mut Index) -> SpotResult<Cursor> {
        self.current = LAST;
        Ok(LAST)
    }

    fn current(&self) -> Cursor {
        self.current
    }

    fn encode(&self) -> NodeState {
        NodeState::Empty
    }
}

/// a node backed by a fixed, pre-sorted list of cursor values; used in tests
/// to drive And/Or/AndWithNegations without a real index
pub struct ListNode {
    values: Vec<Cursor>,
    idx: i64,
}

impl ListNode {
    /// build a node that emits `values` in order, which must already be sorted
    pub fn new(values: Vec<Cursor>) -> ListNode {
        ListNode { values, idx: -1 }
    }
}

impl Node for ListNode {
    fn step(&mut self, _index: &mut Index) -> SpotResult<Cursor> {
        self.idx += 1;
        let current = if (self.idx as usize) < self.values.len() {
            self.values[self.idx as usize]
        } else {
            LAST
        };
        Ok(current)
    }

    fn current(&self) -> Cursor {
        if self.idx < 0 {
            FIRST
        } else if (self.idx as usize) < self.values.len() {
            self.values[self.idx as usize]
        } else {
            LAST
        }
    }

    fn encode(&self) -> NodeState {
        NodeState::List { values: self.values.clone(), idx: self.idx }
    }
}

/// result of a bounded retrieval: collected values plus either resumable
/// state (limit was hit) or nothing (the node reached LAST)
pub enum Retrieval {
    /// the limit was reached before exhaustion; resume with `decode_node(&state)`
    Partial(Vec<(u64, u64)>, NodeState),
    /// the node was exhausted; no more results exist
    Done(Vec<(u64, u64)>),
}

/// repeatedly step `node` until it is exhausted or `max_results` is collected
pub fn retrieve(node: &mut dyn Node, index: &mut Index, max_results: usize) -> SpotResult<Retrieval> {
    let mut results = Vec::new();
    loop {
        let v = node.step(index)?;
        if v == LAST {
            return Ok(Retrieval::Done(results));
        }
        results.push((v.0 as u64, v.1 as u64));
        if results.len() >= max_results {
            return Ok(Retrieval::Partial(results, node.encode()));
        }
    }
}
