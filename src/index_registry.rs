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
//! # process-wide index identifiers
//!
//! A cursor serialized by `nodes::TokenNode` is only meaningful against the
//! `Index` it was built from. Rather than storing a borrow (which a
//! serialized cursor cannot carry across a process restart anyway), each
//! `Index` is stamped with an id from this counter at `open` time; callers
//! resuming a cursor pass the `Index` back in directly, so this id is not
//! needed to resolve the cursor itself, only to let a caller assert it is
//! resuming against the index it thinks it is.
//!
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// allocate the next process-unique index id
pub fn next_index_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::SeqCst) as u64
}
