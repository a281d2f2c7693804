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
//! # spotdb
//!
//! An embedded, on-disk inverted index. Documents are tagged with tokens;
//! each token maps to a sorted posting list of `(value, docid)` pairs spread
//! across fixed-size pages, grouped into a fixed number of hash buckets. Boolean
//! and ranked queries are built as lazy cursors (`nodes`) over those posting
//! lists and stepped forward one record at a time, so a query never has to
//! materialize more of the index than it actually visits.
//!

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![deny(missing_docs)]
#![deny(unused_must_use)]

#[macro_use]
extern crate log;
extern crate byteorder;
extern crate page_size;
extern crate rand;
extern crate sha2;

#[cfg(test)]
extern crate tempfile;

pub mod codec;
pub mod error;
pub mod hashing;
pub mod header;
pub mod index;
pub mod index_registry;
pub mod int_range;
pub mod nodes;
pub mod options;
pub mod page;
pub mod page_manager;

pub use error::{SpotError, SpotResult};
pub use index::Index;
pub use options::IndexOptions;
