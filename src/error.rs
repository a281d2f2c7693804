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
//! # Error type
//!
use std::convert;
use std::error::Error;
use std::fmt;
use std::io;
use std::sync;

/// Errors returned by this crate
pub enum SpotError {
    /// an argument is out of the domain the caller contract allows
    InvalidArgument(String),
    /// a bucket collected more than 65535 distinct colliding token hashes
    BucketOverflow,
    /// header.spot failed structural validation on load
    CorruptHeader(String),
    /// a page failed structural validation on load
    CorruptPage(String),
    /// wrapped IO error
    IO(io::Error),
    /// a lock was poisoned by a panicking thread
    Poisoned(String),
}

impl Error for SpotError {
    fn description(&self) -> &str {
        match *self {
            SpotError::InvalidArgument(ref s) => s.as_str(),
            SpotError::BucketOverflow => "bucket overflow: more than 65535 colliding tokens",
            SpotError::CorruptHeader(ref s) => s.as_str(),
            SpotError::CorruptPage(ref s) => s.as_str(),
            SpotError::IO(_) => "IO error",
            SpotError::Poisoned(ref s) => s.as_str(),
        }
    }

    fn cause(&self) -> Option<&dyn Error> {
        match *self {
            SpotError::IO(ref e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for SpotError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "spotdb error: {}", self.description())
    }
}

impl fmt::Debug for SpotError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        (self as &dyn fmt::Display).fmt(f)
    }
}

impl convert::From<io::Error> for SpotError {
    fn from(err: io::Error) -> SpotError {
        SpotError::IO(err)
    }
}

impl<T> convert::From<sync::PoisonError<T>> for SpotError {
    fn from(err: sync::PoisonError<T>) -> SpotError {
        SpotError::Poisoned(err.to_string())
    }
}

/// result type used throughout this crate
pub type SpotResult<T> = Result<T, SpotError>;
