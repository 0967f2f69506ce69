// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Searchers that work outward from a literal in the pattern's tail or
// interior instead of walking the whole haystack forward. Each one keeps a
// per-call high-water mark: a reverse scan that would re-enter territory a
// previous candidate already covered gives up, and the caller reruns the
// call on the NFA. That trade keeps every call O(n) at the price of an
// occasional full rescan.

use memchr::{memmem, memrchr};

use crate::dfa::{Dfa, DfaCache, DfaResult, RevLimited};
use crate::prefilter::Prefilter;

/// The outcome of a reverse-searcher attempt. `GiveUp` means a budget or
/// anti-quadratic guard tripped and the caller must rerun on the NFA.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attempt {
    Found(usize, usize),
    NoMatch,
    GiveUp,
}

/// How the expression before a required literal matches.
#[derive(Clone, Debug)]
pub enum PrefixKind {
    /// Matches anything, line feeds included (`(?s).*`): the match start
    /// is the search start.
    DotAll,
    /// A single class star (`.*`, `[a-z]*`): the match start is found by
    /// walking backward while bytes stay in the class.
    ClassStar(Box<[bool; 256]>),
    /// Anything else: a reverse program locates the start.
    General,
}

/// `…suffix$` — the pattern can only match ending at the end of the text,
/// so one reverse scan from the end answers everything.
pub fn reverse_anchored(
    rev: &Dfa,
    rcache: &mut DfaCache,
    hay: &[u8],
    at: usize,
) -> Attempt {
    match rev.find_start(rcache, hay, at, hay.len()) {
        DfaResult::Match(s) => Attempt::Found(s, hay.len()),
        DfaResult::NoMatch => Attempt::NoMatch,
        DfaResult::Fail => Attempt::GiveUp,
    }
}

/// `.*\.txt`-shape: one required suffix literal.
///
/// With a dot-all universal prefix the answer is immediate: the match
/// starts at `at` and ends at the last occurrence of the suffix. Otherwise
/// occurrences are tried left to right; for each, a limited reverse scan
/// finds the candidate start and a forward scan anchored there finds the
/// true end.
pub fn reverse_suffix(
    finder: &memmem::Finder<'static>,
    kind: &PrefixKind,
    rev: &Dfa,
    rcache: &mut DfaCache,
    fwd: &Dfa,
    fcache: &mut DfaCache,
    hay: &[u8],
    at: usize,
) -> Attempt {
    let lit_len = finder.needle().len();
    if let PrefixKind::DotAll = *kind {
        return match memmem::rfind(&hay[at..], finder.needle()) {
            Some(i) => Attempt::Found(at, at + i + lit_len),
            None => Attempt::NoMatch,
        };
    }
    let mut pos = at;
    let mut min_start = at;
    while pos <= hay.len() {
        let h = match finder.find(&hay[pos..]) {
            None => return Attempt::NoMatch,
            Some(i) => pos + i,
        };
        let end = h + lit_len;
        match rev.search_reverse_limited(rcache, hay, at, end, min_start) {
            RevLimited::Match(s) => {
                return match fwd.find_end(fcache, hay, s, true, false) {
                    DfaResult::Match(e) => Attempt::Found(s, e),
                    // The reverse program accepted, so the forward program
                    // must too; a cache failure is the only way out.
                    DfaResult::NoMatch | DfaResult::Fail => Attempt::GiveUp,
                };
            }
            RevLimited::NoMatch => {
                min_start = min_start.max(end);
                pos = h + 1;
            }
            RevLimited::Quadratic | RevLimited::Fail => return Attempt::GiveUp,
        }
    }
    Attempt::NoMatch
}

/// 2–32 distinct suffix literals without a common tail. The same loop as
/// `reverse_suffix`, with the packed multi-literal scanner producing the
/// candidates.
pub fn reverse_suffix_set(
    pre: &Prefilter,
    rev: &Dfa,
    rcache: &mut DfaCache,
    fwd: &Dfa,
    fcache: &mut DfaCache,
    hay: &[u8],
    at: usize,
) -> Attempt {
    let mut pos = at;
    let mut min_start = at;
    while pos <= hay.len() {
        let (h, end) = match pre.find_span(hay, pos) {
            None => return Attempt::NoMatch,
            Some(span) => span,
        };
        match rev.search_reverse_limited(rcache, hay, at, end, min_start) {
            RevLimited::Match(s) => {
                return match fwd.find_end(fcache, hay, s, true, false) {
                    DfaResult::Match(e) => Attempt::Found(s, e),
                    DfaResult::NoMatch | DfaResult::Fail => Attempt::GiveUp,
                };
            }
            RevLimited::NoMatch => {
                min_start = min_start.max(end);
                pos = h + 1;
            }
            RevLimited::Quadratic | RevLimited::Fail => return Attempt::GiveUp,
        }
    }
    Attempt::NoMatch
}

/// A strong interior literal with pattern on both sides, e.g.
/// `ERROR.*connection.*timeout`. Inner hits are enumerated left to right;
/// the reverse prefix program extends each hit backward to the match
/// start, the forward suffix program extends it forward to the match end.
/// The first confirmed pair is the leftmost match.
#[allow(clippy::too_many_arguments)]
pub fn reverse_inner(
    pre: &Prefilter,
    kind: &PrefixKind,
    prefix_rev: Option<&Dfa>,
    pcache: &mut DfaCache,
    suffix_fwd: &Dfa,
    scache: &mut DfaCache,
    hay: &[u8],
    at: usize,
) -> Attempt {
    let mut pos = at;
    let mut min_start = at;
    while pos <= hay.len() {
        let (p, pend) = match pre.find_span(hay, pos) {
            None => return Attempt::NoMatch,
            Some(span) => span,
        };
        let start = match *kind {
            PrefixKind::DotAll => Some(at),
            PrefixKind::ClassStar(ref table) => {
                match walk_back(table, hay, at, p, min_start) {
                    WalkBack::Start(s) => Some(s),
                    WalkBack::Blocked => return Attempt::GiveUp,
                }
            }
            PrefixKind::General => {
                let rev = prefix_rev.expect("general prefix has a reverse program");
                match rev.search_reverse_limited(pcache, hay, at, p, min_start) {
                    RevLimited::Match(s) => Some(s),
                    RevLimited::NoMatch => None,
                    RevLimited::Quadratic | RevLimited::Fail => {
                        return Attempt::GiveUp
                    }
                }
            }
        };
        if let Some(s) = start {
            match suffix_fwd.find_end(scache, hay, pend, true, false) {
                DfaResult::Match(e) => return Attempt::Found(s, e),
                DfaResult::NoMatch => {}
                DfaResult::Fail => return Attempt::GiveUp,
            }
        }
        // Overlapping candidates are the quadratic case this mark exists
        // for: the next reverse scan refuses to cross it.
        min_start = min_start.max(pend);
        pos = p + 1;
    }
    Attempt::NoMatch
}

enum WalkBack {
    Start(usize),
    Blocked,
}

/// Walk backward from `p` while bytes stay in the class, stopping at `at`.
/// Refuses to cross `min_start` (a previous candidate already scanned
/// below it).
fn walk_back(
    table: &[bool; 256],
    hay: &[u8],
    at: usize,
    p: usize,
    min_start: usize,
) -> WalkBack {
    let mut s = p;
    while s > at && table[hay[s - 1] as usize] {
        if s <= min_start && min_start > at {
            return WalkBack::Blocked;
        }
        s -= 1;
    }
    WalkBack::Start(s)
}

/// `(?m)^…suffix` — multiline start anchors make reverse verification
/// unsafe, so this only locates the line of the first suffix hit; the
/// caller runs the forward NFA from there.
pub fn multiline_start(pre: &Prefilter, hay: &[u8], at: usize) -> Option<usize> {
    let (h, _) = pre.find_span(hay, at)?;
    let line_start = memrchr(b'\n', &hay[..h]).map_or(0, |i| i + 1);
    Some(line_start.max(at))
}

#[cfg(test)]
mod tests {
    use memchr::memmem;
    use regex_syntax::ParserBuilder;

    use super::{reverse_anchored, reverse_suffix, Attempt, PrefixKind};
    use crate::compile::Compiler;
    use crate::dfa::{Dfa, DfaCache};
    use crate::program::Program;

    fn progs(pattern: &str) -> (Program, Program) {
        let hir = ParserBuilder::new().build().parse(pattern).unwrap();
        let fwd = Compiler::new(1 << 20).compile(&hir).unwrap();
        let rev = Compiler::new(1 << 20).reverse(true).compile(&hir).unwrap();
        (fwd, rev)
    }

    #[test]
    fn anchored_tail() {
        let (_, rev) = progs(r"ab+c$");
        let dfa = Dfa::reverse(&rev, 10_000, 1_000);
        let mut cache = DfaCache::new();
        assert_eq!(
            reverse_anchored(&dfa, &mut cache, b"xxabbbc", 0),
            Attempt::Found(2, 7)
        );
        assert_eq!(
            reverse_anchored(&dfa, &mut cache, b"xxabbbcx", 0),
            Attempt::NoMatch
        );
    }

    #[test]
    fn suffix_with_dotall_prefix() {
        let (fwd, rev) = progs(r"(?s).*\.txt");
        let ffa = Dfa::forward(&fwd, 10_000, 1_000);
        let rfa = Dfa::reverse(&rev, 10_000, 1_000);
        let (mut fc, mut rc) = (DfaCache::new(), DfaCache::new());
        let finder = memmem::Finder::new(b".txt").into_owned();
        assert_eq!(
            reverse_suffix(
                &finder,
                &PrefixKind::DotAll,
                &rfa,
                &mut rc,
                &ffa,
                &mut fc,
                b"a.txt b.txt",
                0
            ),
            Attempt::Found(0, 11)
        );
    }

    #[test]
    fn suffix_with_general_prefix() {
        let (fwd, rev) = progs(r"[a-z]+\.txt");
        let ffa = Dfa::forward(&fwd, 10_000, 1_000);
        let rfa = Dfa::reverse(&rev, 10_000, 1_000);
        let (mut fc, mut rc) = (DfaCache::new(), DfaCache::new());
        let finder = memmem::Finder::new(b".txt").into_owned();
        assert_eq!(
            reverse_suffix(
                &finder,
                &PrefixKind::General,
                &rfa,
                &mut rc,
                &ffa,
                &mut fc,
                b"00readme.txt00",
                0
            ),
            Attempt::Found(2, 12)
        );
    }
}
