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
//! # range predicates over tokens
//!
//! A numeric field is indexed by tagging each document with one token per
//! bit of its value, `#name:a:a+2^bit-1`, so that a half-open range query
//! decomposes into a short OR of power-of-two interval tokens rather than a
//! full bucket scan. `less_than`/`greater_than`/`range` return the token
//! list to OR together; `tokens` returns the list to tag a document with at
//! insert time.
//!
const PREFIX: char = '#';

/// number of bits needed to cover an inclusive `[low, high]` range
fn num_bits(low: i64, high: i64) -> u32 {
    let mut bits = 0u32;
    let mut r = high - low;
    while r > 0 {
        r >>= 1;
        bits += 1;
    }
    bits
}

/// floor division, matching Python's `//` for possibly-negative operands
fn div_floor(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if (r != 0) && ((r < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

/// a named integer field and its indexable `[low, high]` domain
#[derive(Clone, Debug)]
pub struct IntRange {
    name: String,
    low: i64,
    high: i64,
    num_bits: u32,
}

impl IntRange {
    /// declare a range-indexed field named `name` over inclusive `[low, high]`
    pub fn new(name: &str, low: i64, high: i64) -> IntRange {
        IntRange { name: name.to_string(), low, high, num_bits: num_bits(low, high) }
    }

    /// tokens to OR together to match every value strictly less than `x`
    pub fn less_than(&self, x: i64) -> Vec<String> {
        self.range(self.low, x - 1)
    }

    /// tokens to OR together to match every value strictly greater than `x`
    pub fn greater_than(&self, x: i64) -> Vec<String> {
        self.range(x + 1, self.high)
    }

    /// tokens to OR together to match every value in the inclusive `[low, high]` range
    pub fn range(&self, low: i64, high: i64) -> Vec<String> {
        let low = low - self.low;
        let high = high - self.low;
        if self.num_bits == 0 {
            return self._range(low, high, 1);
        }
        self._range(low, high, 1i64 << (self.num_bits - 1))
    }

    fn _range(&self, low: i64, high: i64, step: i64) -> Vec<String> {
        if low > high {
            return Vec::new();
        }
        if step == 1 {
            debug_assert_eq!(low, high);
            return vec![format!("{}{}:{}:{}", PREFIX, self.name, low, low)];
        }

        let mut a0 = div_floor(low, step) * step;
        if a0 < low {
            a0 += step;
        }

        let mut r = Vec::new();
        let mut a = a0;
        while a + step - 1 <= high {
            r.push(format!("{}{}:{}:{}", PREFIX, self.name, a, a + step - 1));
            a += step;
        }

        if r.is_empty() {
            return self._range(low, high, step / 2);
        }
        let mut out = self._range(low, a0 - 1, step / 2);
        out.extend(r);
        out.extend(self._range(a, high, step / 2));
        out
    }

    /// tokens to tag a document with at insert time, one per bit of `x`
    pub fn tokens(&self, x: i64) -> Vec<String> {
        let mut r = Vec::with_capacity(self.num_bits as usize);
        for bit in 0..self.num_bits {
            let step = 1i64 << bit;
            let a = div_floor(x, step) * step;
            r.push(format!("{}{}:{}:{}", PREFIX, self.name, a, a + step - 1));
        }
        r
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn num_bits_covers_the_domain() {
        assert_eq!(num_bits(0, 0), 0);
        assert_eq!(num_bits(0, 1), 1);
        assert_eq!(num_bits(0, 15), 4);
        assert_eq!(num_bits(4, 15), 4);
    }

    #[test]
    fn div_floor_matches_python_semantics() {
        assert_eq!(div_floor(7, 2), 3);
        assert_eq!(div_floor(-7, 2), -4);
        assert_eq!(div_floor(-8, 2), -4);
    }

    #[test]
    fn tokens_are_shared_across_neighboring_values() {
        let r = IntRange::new("age", 0, 127);
        let t7 = r.tokens(7);
        let t6 = r.tokens(6);
        // values 6 and 7 share the widest-bit ancestor token
        assert_eq!(t7.last(), t6.last());
    }

    #[test]
    fn range_decomposition_covers_every_value_exactly_once() {
        let r = IntRange::new("age", 0, 31);
        for lo in 0..8 {
            for hi in lo..8 {
                let toks = r.range(lo, hi);
                // every decomposed interval token must individually fall inside [lo, hi]
                for t in &toks {
                    let parts: Vec<&str> = t.trim_start_matches('#').splitn(2, ':').nth(1).unwrap().split(':').collect();
                    let a: i64 = parts[0].parse().unwrap();
                    let b: i64 = parts[1].parse().unwrap();
                    assert!(a >= lo && b <= hi, "token {} escapes [{},{}]", t, lo, hi);
                }
            }
        }
    }

    #[test]
    fn less_than_and_greater_than_are_disjoint_from_range() {
        let r = IntRange::new("age", 0, 100);
        let lt = r.less_than(50);
        let gt = r.greater_than(50);
        for t in &lt {
            assert!(!gt.contains(t));
        }
    }
}
