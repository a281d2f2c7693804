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
//! # Token hashing
//!
//! `hash64` must never change: it is part of the on-disk format. Any
//! modification breaks every index written under the old function.
//!
use byteorder::{BigEndian, ByteOrder};
use sha2::{Digest, Sha256};

/// reserved bucket id for the empty-string token, used for "all documents"
pub const RESERVED_BUCKET_ID: u64 = 0;

/// last 64 bits of SHA-256 of the token's UTF-8 bytes, big-endian
pub fn hash64(token: &str) -> u64 {
    if token.is_empty() {
        // the empty token hashes to 0 by convention, not by SHA-256 coincidence,
        // so it always routes to the reserved "all documents" bucket
        return 0;
    }
    let digest = Sha256::digest(token.as_bytes());
    BigEndian::read_u64(&digest[digest.len() - 8..])
}

/// bucket id a token hashes to under `num_buckets` buckets
pub fn bucket_id(token: &str, num_buckets: u64) -> u64 {
    hash64(token) % num_buckets
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_token_hashes_to_zero() {
        assert_eq!(hash64(""), 0);
        assert_eq!(bucket_id("", 4096), RESERVED_BUCKET_ID);
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash64("foo"), hash64("foo"));
        assert_ne!(hash64("foo"), hash64("bar"));
    }

    #[test]
    fn known_sha256_tail() {
        // sha256("foo") = 2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae
        // last 8 bytes (16 hex chars): f98a5e886266e7ae
        assert_eq!(hash64("foo"), 0xf98a5e886266e7ae);
    }
}
