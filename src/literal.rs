// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use regex_syntax::hir::literal::{ExtractKind, Extractor, Seq};
use regex_syntax::hir::{Hir, HirKind};

/// An ordered set of literal byte strings extracted from one side (or the
/// interior) of a pattern.
///
/// Order matters: it mirrors the order alternatives appear in the pattern,
/// which is what lets a leftmost-first prefilter preserve priority.
#[derive(Clone, Debug, Default)]
pub struct LiteralSet {
    lits: Vec<Vec<u8>>,
    /// True iff every literal is exact, i.e. the set *is* the language of
    /// the expression it was extracted from rather than a required
    /// fragment of it.
    complete: bool,
}

impl LiteralSet {
    pub fn empty() -> LiteralSet {
        LiteralSet::default()
    }

    fn from_seq(seq: Seq, max_literals: usize) -> LiteralSet {
        let complete = seq.is_exact();
        let lits = match seq.literals() {
            None => return LiteralSet::empty(),
            Some(lits) => lits,
        };
        if lits.is_empty() || lits.len() > max_literals {
            return LiteralSet::empty();
        }
        // An empty literal means "everything matches here"; such a set
        // cannot skip anything and is useless as a filter.
        if lits.iter().any(|lit| lit.is_empty()) {
            return LiteralSet::empty();
        }
        LiteralSet {
            lits: lits.iter().map(|lit| lit.as_bytes().to_vec()).collect(),
            complete,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lits.len()
    }

    pub fn literals(&self) -> &[Vec<u8>] {
        &self.lits
    }

    /// True iff a hit for any literal is a whole match of the expression
    /// the set came from.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn min_len(&self) -> usize {
        self.lits.iter().map(|l| l.len()).min().unwrap_or(0)
    }

    pub fn max_len(&self) -> usize {
        self.lits.iter().map(|l| l.len()).max().unwrap_or(0)
    }

    /// True iff every literal has the same length.
    pub fn same_len(&self) -> bool {
        self.min_len() == self.max_len()
    }

    pub fn longest_common_prefix(&self) -> &[u8] {
        let first = match self.lits.first() {
            None => return &[],
            Some(f) => f,
        };
        let mut len = first.len();
        for lit in &self.lits[1..] {
            len = len
                .min(lit.iter().zip(first.iter()).take_while(|(a, b)| a == b).count());
        }
        &first[..len]
    }

    pub fn longest_common_suffix(&self) -> &[u8] {
        let first = match self.lits.first() {
            None => return &[],
            Some(f) => f,
        };
        let mut len = first.len();
        for lit in &self.lits[1..] {
            len = len.min(
                lit.iter()
                    .rev()
                    .zip(first.iter().rev())
                    .take_while(|(a, b)| a == b)
                    .count(),
            );
        }
        &first[first.len() - len..]
    }
}

/// Everything the literal extractor learned about a pattern.
#[derive(Clone, Debug)]
pub struct Literals {
    pub prefixes: LiteralSet,
    pub suffixes: LiteralSet,
    pub inner: Option<InnerLiterals>,
}

/// A required interior literal set, with the pattern split around it.
///
/// For a match, some inner literal occurs with the prefix expression
/// matching immediately before it and the suffix expression immediately
/// after. The split sides are kept as expressions so the engine can
/// compile a reverse program for the prefix and a forward program for the
/// suffix.
#[derive(Clone, Debug)]
pub struct InnerLiterals {
    pub lits: LiteralSet,
    pub prefix: Hir,
    pub suffix: Hir,
}

/// Extract prefix, suffix and inner literal sets from a parsed pattern.
pub fn extract(hir: &Hir, max_literals: usize) -> Literals {
    let mut pre_seq = Extractor::new().extract(hir);
    pre_seq.optimize_for_prefix_by_preference();
    let mut suf_seq = Extractor::new().kind(ExtractKind::Suffix).extract(hir);
    suf_seq.optimize_for_suffix_by_preference();
    Literals {
        prefixes: LiteralSet::from_seq(pre_seq, max_literals),
        suffixes: LiteralSet::from_seq(suf_seq, max_literals),
        inner: extract_inner(hir, max_literals),
    }
}

/// Look for a concatenation element that is wholly a (small, exact)
/// literal set, with non-empty pattern on both sides. The best candidate
/// maximizes the shortest literal, which is the usual proxy for prefilter
/// selectivity.
fn extract_inner(hir: &Hir, max_literals: usize) -> Option<InnerLiterals> {
    let subs = match *hir.kind() {
        HirKind::Concat(ref subs) => subs,
        _ => return None,
    };
    if subs.len() < 3 {
        return None;
    }
    let mut best: Option<(usize, LiteralSet)> = None;
    for i in 1..subs.len() - 1 {
        let seq = Extractor::new().extract(&subs[i]);
        if !seq.is_exact() {
            continue;
        }
        let set = LiteralSet::from_seq(seq, max_literals);
        if set.is_empty() || set.min_len() < 2 {
            continue;
        }
        let better = match best {
            None => true,
            Some((_, ref b)) => set.min_len() > b.min_len(),
        };
        if better {
            best = Some((i, set));
        }
    }
    let (i, lits) = best?;
    let prefix = Hir::concat(subs[..i].to_vec());
    let suffix = Hir::concat(subs[i + 1..].to_vec());
    Some(InnerLiterals { lits, prefix, suffix })
}

/// True iff the first consuming sub-expression of the pattern is a digit
/// class (so a digit scan can serve as a prefilter).
pub fn starts_with_digit_class(hir: &Hir) -> bool {
    match *hir.kind() {
        HirKind::Class(ref cls) => class_is_digits(cls),
        HirKind::Capture(ref cap) => starts_with_digit_class(&cap.sub),
        HirKind::Repetition(ref rep) => {
            rep.min >= 1 && starts_with_digit_class(&rep.sub)
        }
        HirKind::Concat(ref subs) => subs
            .iter()
            .find(|sub| !matches!(*sub.kind(), HirKind::Look(_)))
            .map_or(false, starts_with_digit_class),
        HirKind::Alternation(ref subs) => {
            subs.iter().all(starts_with_digit_class)
        }
        _ => false,
    }
}

fn class_is_digits(cls: &regex_syntax::hir::Class) -> bool {
    use regex_syntax::hir::Class;
    match *cls {
        Class::Unicode(ref cls) => cls
            .iter()
            .all(|r| r.start() >= '0' && r.end() <= '9'),
        Class::Bytes(ref cls) => {
            cls.iter().all(|r| r.start() >= b'0' && r.end() <= b'9')
        }
    }
}

#[cfg(test)]
mod tests {
    use regex_syntax::ParserBuilder;

    use super::{extract, starts_with_digit_class};

    fn hir(pattern: &str) -> regex_syntax::hir::Hir {
        ParserBuilder::new().build().parse(pattern).unwrap()
    }

    fn prefixes(pattern: &str) -> Vec<String> {
        extract(&hir(pattern), 64)
            .prefixes
            .literals()
            .iter()
            .map(|l| String::from_utf8_lossy(l).into_owned())
            .collect()
    }

    #[test]
    fn single() {
        assert_eq!(prefixes("abc"), vec!["abc"]);
        assert!(extract(&hir("abc"), 64).prefixes.is_complete());
        assert!(!extract(&hir("abc+"), 64).prefixes.is_complete());
    }

    #[test]
    fn alternates() {
        assert_eq!(prefixes("abc|def"), vec!["abc", "def"]);
        assert_eq!(prefixes("foo|bar|baz"), vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn unbounded_sets_are_dropped() {
        // `\w+` expands to far more than 64 alternates.
        assert!(extract(&hir(r"\w+foo"), 64).prefixes.is_empty());
    }

    #[test]
    fn suffixes() {
        let lits = extract(&hir(r".*\.txt"), 64);
        assert_eq!(lits.suffixes.literals(), &[b".txt".to_vec()]);
    }

    #[test]
    fn inner() {
        let lits = extract(&hir(".*connection.*"), 64);
        let inner = lits.inner.expect("inner literal");
        assert_eq!(inner.lits.literals(), &[b"connection".to_vec()]);
    }

    #[test]
    fn digit_shapes() {
        assert!(starts_with_digit_class(&hir(r"\d+\.\d+")));
        assert!(starts_with_digit_class(&hir(r"(\d{1,3})\.")));
        assert!(!starts_with_digit_class(&hir(r"v\d+")));
    }

    #[test]
    fn common_affixes() {
        let lits = extract(&hir("foobar|fooqux"), 64);
        assert_eq!(lits.prefixes.longest_common_prefix(), b"foo");
        let lits = extract(&hir("abcz|defz"), 64);
        assert_eq!(lits.suffixes.longest_common_suffix(), b"z");
    }
}
