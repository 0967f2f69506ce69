// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Searchers for patterns that are nothing but byte-class repetitions.
// `\w+` and friends dominate real-world scanning workloads, and a 256-entry
// membership table beats an automaton at them by a wide margin: one load
// and one branch per byte, no thread bookkeeping at all.

use regex_syntax::hir::{Class, Hir, HirKind};

/// One repeated byte class: its membership table and repetition bounds.
#[derive(Clone)]
pub struct Phase {
    table: Box<[bool; 256]>,
    min: usize,
    max: Option<usize>,
    /// True iff the table covers the class exactly. A clipped table (from
    /// a class reaching past ASCII, like Unicode `\w`) is only valid on
    /// all-ASCII haystacks; the dispatcher checks that before using it.
    exact: bool,
}

impl std::fmt::Debug for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Phase")
            .field("min", &self.min)
            .field("max", &self.max)
            .field("exact", &self.exact)
            .finish()
    }
}

impl Phase {
    /// Build a phase from a repetition over a byte class. Ranges past
    /// ASCII are clipped and the phase is marked inexact; run lengths over
    /// multi-byte characters would not line up with byte counts otherwise.
    pub fn from_hir(hir: &Hir) -> Option<Phase> {
        let (sub, min, max) = match *hir.kind() {
            HirKind::Repetition(ref rep) => {
                (&*rep.sub, rep.min as usize, rep.max.map(|m| m as usize))
            }
            // A bare class is a repetition of exactly one.
            HirKind::Class(_) => (hir, 1, Some(1)),
            _ => return None,
        };
        if min < 1 {
            return None;
        }
        let cls = match *sub.kind() {
            HirKind::Class(ref cls) => cls,
            _ => return None,
        };
        let mut table = Box::new([false; 256]);
        let mut exact = true;
        match *cls {
            Class::Unicode(ref cls) => {
                for r in cls.iter() {
                    let (s, e) = (r.start() as u32, r.end() as u32);
                    if e > 0x7F {
                        exact = false;
                    }
                    if s > 0x7F {
                        continue;
                    }
                    for b in s..=e.min(0x7F) {
                        table[b as usize] = true;
                    }
                }
            }
            Class::Bytes(ref cls) => {
                for r in cls.iter() {
                    if r.end() > 0x7F {
                        exact = false;
                    }
                    if r.start() > 0x7F {
                        continue;
                    }
                    for b in r.start()..=r.end().min(0x7F) {
                        table[b as usize] = true;
                    }
                }
            }
        }
        Some(Phase { table, min, max, exact })
    }

    /// True iff the table is exact for arbitrary haystacks.
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    #[inline(always)]
    fn contains(&self, b: u8) -> bool {
        self.table[b as usize]
    }

    /// True iff the two phases share any byte. Adjacent overlapping phases
    /// force give-back at the boundary.
    pub fn overlaps(&self, other: &Phase) -> bool {
        (0..256).any(|b| self.table[b] && other.table[b])
    }
}

/// A single repeated class, e.g. `[a-z]+` or `\d{2,4}`.
#[derive(Clone, Debug)]
pub struct CharClassSearcher {
    phase: Phase,
}

impl CharClassSearcher {
    pub fn new(phase: Phase) -> CharClassSearcher {
        debug_assert!(phase.min >= 1);
        CharClassSearcher { phase }
    }

    pub fn is_exact(&self) -> bool {
        self.phase.exact
    }

    pub fn find_at(&self, hay: &[u8], at: usize) -> Option<(usize, usize)> {
        let ph = &self.phase;
        let mut at = at;
        while at < hay.len() {
            // Skip to the next class byte.
            let s = at + hay[at..].iter().position(|&b| ph.contains(b))?;
            // Take the whole run; matching is greedy.
            let mut e = s + 1;
            while e < hay.len() && ph.contains(hay[e]) {
                e += 1;
            }
            let run = e - s;
            if run >= ph.min {
                let take = ph.max.map_or(run, |m| run.min(m));
                return Some((s, s + take));
            }
            // A short run can't start a match anywhere inside itself.
            at = e + 1;
        }
        None
    }

    /// Emit all matches in one traversal. Within a long run, successive
    /// matches tile it from the left, which is exactly what repeated
    /// leftmost-first searches would produce.
    pub fn find_all_into(
        &self,
        hay: &[u8],
        limit: usize,
        out: &mut Vec<(usize, usize)>,
    ) {
        let mut pos = 0;
        while let Some((s, e)) = self.find_at(hay, pos) {
            out.push((s, e));
            if limit != 0 && out.len() >= limit {
                return;
            }
            pos = e;
        }
    }
}

/// A concatenation of repeated classes, e.g. `[a-z]+[0-9]+`. Each phase is
/// consumed greedily; bounded phases can give bytes back when a later
/// phase starves.
#[derive(Clone, Debug)]
pub struct CompositeSearcher {
    phases: Vec<Phase>,
}

impl CompositeSearcher {
    pub fn new(phases: Vec<Phase>) -> CompositeSearcher {
        debug_assert!(phases.len() >= 2);
        CompositeSearcher { phases }
    }

    pub fn is_exact(&self) -> bool {
        self.phases.iter().all(|p| p.exact)
    }

    pub fn find_at(&self, hay: &[u8], at: usize) -> Option<(usize, usize)> {
        let first = &self.phases[0];
        let mut s = at;
        while s < hay.len() {
            s += hay[s..].iter().position(|&b| first.contains(b))?;
            if let Some(e) = self.match_phases(hay, 0, s) {
                return Some((s, e));
            }
            s += 1;
        }
        None
    }

    fn match_phases(&self, hay: &[u8], i: usize, pos: usize) -> Option<usize> {
        if i == self.phases.len() {
            return Some(pos);
        }
        let ph = &self.phases[i];
        let mut run = 0;
        while pos + run < hay.len() && ph.contains(hay[pos + run]) {
            run += 1;
            if let Some(max) = ph.max {
                if run == max {
                    break;
                }
            }
        }
        if run < ph.min {
            return None;
        }
        let mut take = run;
        loop {
            if let Some(e) = self.match_phases(hay, i + 1, pos + take) {
                return Some(e);
            }
            if take == ph.min {
                return None;
            }
            take -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use regex_syntax::ParserBuilder;

    use super::{CharClassSearcher, CompositeSearcher, Phase};

    fn phase(pattern: &str) -> Phase {
        let hir = ParserBuilder::new().build().parse(pattern).unwrap();
        Phase::from_hir(&hir).unwrap()
    }

    #[test]
    fn single_class_runs() {
        let s = CharClassSearcher::new(phase("[a-z]+"));
        assert_eq!(s.find_at(b"12abc34def", 0), Some((2, 5)));
        assert_eq!(s.find_at(b"12abc34def", 5), Some((7, 10)));
        assert_eq!(s.find_at(b"123", 0), None);
    }

    #[test]
    fn bounded_class() {
        let s = CharClassSearcher::new(phase(r"\d{2,3}"));
        assert_eq!(s.find_at(b"a1b22c4444", 0), Some((3, 5)));
        // A long run is capped at the upper bound.
        assert_eq!(s.find_at(b"4444", 0), Some((0, 3)));
    }

    #[test]
    fn streaming_tiles_runs() {
        let s = CharClassSearcher::new(phase(r"\d{1,2}"));
        let mut out = vec![];
        s.find_all_into(b"12345", 0, &mut out);
        assert_eq!(out, vec![(0, 2), (2, 4), (4, 5)]);
    }

    #[test]
    fn composite_sequence() {
        let s = CompositeSearcher::new(vec![phase("[a-z]+"), phase("[0-9]+")]);
        assert_eq!(s.find_at(b"!!abc123!!", 0), Some((2, 8)));
        assert_eq!(s.find_at(b"abc!123", 0), None);
    }

    #[test]
    fn composite_give_back() {
        // The first phase must give a byte back for the second to match.
        let s =
            CompositeSearcher::new(vec![phase("[a-z0-9]+"), phase("[0-9]{2}")]);
        assert_eq!(s.find_at(b"ab1234", 0), Some((0, 6)));
    }

    #[test]
    fn unicode_classes_are_inexact() {
        // Unicode \w reaches far beyond ASCII, so the table is clipped.
        assert!(!phase(r"\w+").is_exact());
        assert!(phase("[a-z]+").is_exact());
    }
}
