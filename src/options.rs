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
//! # Index creation options
//!
//! Knobs that only matter at create time: a reopened index must agree with
//! whatever was persisted in its header, so these are only consulted the
//! first time a path is opened.
//!

/// default number of hash buckets for a newly created index
pub const DEFAULT_NUM_BUCKETS: u64 = 4096;

/// default cap on pages resident in the cache (≈ 128 MB at 4096-byte pages)
pub const DEFAULT_MAX_RESIDENT_PAGES: usize = 32_000;

/// options consulted when creating a new index; ignored (and not re-applied)
/// when reopening an existing one
#[derive(Clone, Copy, Debug)]
pub struct IndexOptions {
    /// number of hash buckets, fixed for the lifetime of the index
    pub num_buckets: u64,
    /// page size in bytes, fixed for the lifetime of the index
    pub page_size: usize,
    /// soft cap on resident pages held by the page cache
    pub max_resident_pages: usize,
}

impl Default for IndexOptions {
    fn default() -> IndexOptions {
        IndexOptions {
            num_buckets: DEFAULT_NUM_BUCKETS,
            page_size: page_size::get(),
            max_resident_pages: DEFAULT_MAX_RESIDENT_PAGES,
        }
    }
}
