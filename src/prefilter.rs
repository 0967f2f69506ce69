// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Prefilters find *candidate* positions quickly; the automata confirm
// them. There are a few ways to scan the text for a literal set, picked by
// shape:
//
// 1. A single byte. Just use memchr.
// 2. Two or three distinct single bytes: memchr2/memchr3.
// 3. A bigger set of single bytes: a 256-entry membership table.
// 4. One multi-byte literal: the memmem substring searcher.
// 5. 2 to 32 multi-byte literals: the packed (Teddy family) SIMD searcher.
// 6. Anything larger: a full Aho-Corasick automaton.
//
// A prefilter never misses: every true match position is at or after some
// reported candidate. When the literal set is complete, a candidate *is* a
// match and the automata can be skipped entirely.

use aho_corasick::packed;
use aho_corasick::{AhoCorasick, Input, MatchKind};
use memchr::{memchr, memchr2, memchr3, memmem};

use crate::literal::LiteralSet;

#[derive(Clone, Debug)]
enum Matcher {
    /// A single byte.
    Byte(u8),
    /// Two distinct bytes.
    Byte2(u8, u8),
    /// Three distinct bytes.
    Byte3(u8, u8, u8),
    /// A set of four or more single-byte literals.
    ByteSet(Box<[bool; 256]>),
    /// A single multi-byte literal.
    Memmem(memmem::Finder<'static>),
    /// 2..=32 multi-byte literals, scanned with packed SIMD shuffles.
    Packed(packed::Searcher),
    /// Too many literals for the packed searcher.
    AhoCorasick(AhoCorasick),
    /// ASCII digit runs; used when the best literal set is "a digit".
    Digits,
}

/// A literal scanner with a uniform candidate-reporting interface.
#[derive(Clone, Debug)]
pub struct Prefilter {
    matcher: Matcher,
    complete: bool,
    literal_len: Option<usize>,
}

impl Prefilter {
    /// Build a prefilter for a literal set. Returns `None` when the set is
    /// empty or its shortest literal is below the configured minimum (a
    /// filter that fires on nearly every position costs more than it
    /// saves).
    pub fn build(set: &LiteralSet, min_literal_len: usize) -> Option<Prefilter> {
        if set.is_empty() || set.min_len() < min_literal_len.max(1) {
            return None;
        }
        let lits = set.literals();
        let complete = set.is_complete();
        let literal_len = if set.same_len() { Some(set.min_len()) } else { None };
        let matcher = if set.max_len() == 1 {
            match lits.len() {
                1 => Matcher::Byte(lits[0][0]),
                2 => Matcher::Byte2(lits[0][0], lits[1][0]),
                3 => Matcher::Byte3(lits[0][0], lits[1][0], lits[2][0]),
                _ => {
                    let mut table = Box::new([false; 256]);
                    for lit in lits {
                        table[lit[0] as usize] = true;
                    }
                    Matcher::ByteSet(table)
                }
            }
        } else if lits.len() == 1 {
            Matcher::Memmem(memmem::Finder::new(&lits[0]).into_owned())
        } else if lits.len() <= 32 {
            match packed::Config::new()
                .match_kind(packed::MatchKind::LeftmostFirst)
                .builder()
                .extend(lits)
                .build()
            {
                Some(s) => Matcher::Packed(s),
                None => Matcher::AhoCorasick(Self::automaton(lits)?),
            }
        } else {
            Matcher::AhoCorasick(Self::automaton(lits)?)
        };
        Some(Prefilter { matcher, complete, literal_len })
    }

    /// A scanner that skips to the next ASCII digit. Never complete.
    pub fn digits() -> Prefilter {
        Prefilter { matcher: Matcher::Digits, complete: false, literal_len: None }
    }

    fn automaton(lits: &[Vec<u8>]) -> Option<AhoCorasick> {
        AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .build(lits)
            .ok()
    }

    /// The starting position of the next candidate at or after `at`.
    pub fn find(&self, hay: &[u8], at: usize) -> Option<usize> {
        self.find_span(hay, at).map(|(s, _)| s)
    }

    /// The next candidate with the end of the literal that produced it.
    pub fn find_span(&self, hay: &[u8], at: usize) -> Option<(usize, usize)> {
        if at > hay.len() {
            return None;
        }
        match self.matcher {
            Matcher::Byte(b) => {
                memchr(b, &hay[at..]).map(|i| (at + i, at + i + 1))
            }
            Matcher::Byte2(b1, b2) => {
                memchr2(b1, b2, &hay[at..]).map(|i| (at + i, at + i + 1))
            }
            Matcher::Byte3(b1, b2, b3) => {
                memchr3(b1, b2, b3, &hay[at..]).map(|i| (at + i, at + i + 1))
            }
            Matcher::ByteSet(ref table) => hay[at..]
                .iter()
                .position(|&b| table[b as usize])
                .map(|i| (at + i, at + i + 1)),
            Matcher::Memmem(ref finder) => finder
                .find(&hay[at..])
                .map(|i| (at + i, at + i + finder.needle().len())),
            Matcher::Packed(ref searcher) => searcher
                .find_in(hay, aho_corasick::Span::from(at..hay.len()))
                .map(|m| (m.start(), m.end())),
            Matcher::AhoCorasick(ref ac) => ac
                .find(Input::new(hay).range(at..))
                .map(|m| (m.start(), m.end())),
            Matcher::Digits => hay[at..]
                .iter()
                .position(|b| b.is_ascii_digit())
                .map(|i| (at + i, at + i + 1)),
        }
    }

    /// True iff a candidate is always a whole pattern match.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The literal length when all literals have one, which is what turns a
    /// complete candidate position into a match span.
    pub fn literal_len(&self) -> Option<usize> {
        self.literal_len
    }

    /// True iff this prefilter runs a full Aho-Corasick automaton.
    pub fn is_aho_corasick(&self) -> bool {
        matches!(self.matcher, Matcher::AhoCorasick(_))
    }
}

#[cfg(test)]
mod tests {
    use super::Prefilter;
    use crate::literal::LiteralSet;

    fn set(lits: &[&str]) -> LiteralSet {
        // Build through extraction so completeness is tracked the same way
        // the engine sees it.
        let pattern = lits.join("|");
        let hir = regex_syntax::ParserBuilder::new()
            .build()
            .parse(&pattern)
            .unwrap();
        crate::literal::extract(&hir, 64).prefixes
    }

    #[test]
    fn single_byte() {
        let p = Prefilter::build(&set(&["a"]), 1).unwrap();
        assert_eq!(p.find(b"xya", 0), Some(2));
        assert_eq!(p.find(b"xya", 3), None);
        assert!(p.is_complete());
        assert_eq!(p.literal_len(), Some(1));
    }

    #[test]
    fn substring() {
        let p = Prefilter::build(&set(&["needle"]), 1).unwrap();
        assert_eq!(p.find_span(b"hay needle hay", 0), Some((4, 10)));
        assert_eq!(p.find(b"hay needle hay", 5), None);
    }

    #[test]
    fn multi_literal_priority() {
        let p = Prefilter::build(&set(&["foo", "bar", "baz"]), 1).unwrap();
        assert_eq!(p.find_span(b"prefix bar suffix", 0), Some((7, 10)));
    }

    #[test]
    fn min_len_rejects() {
        assert!(Prefilter::build(&set(&["a"]), 2).is_none());
    }

    #[test]
    fn digit_scanner() {
        let p = Prefilter::digits();
        assert_eq!(p.find(b"abc123", 0), Some(3));
        assert_eq!(p.find(b"abcdef", 0), None);
        assert!(!p.is_complete());
    }
}
