// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use log::debug;
use regex_syntax::hir::{Hir, HirKind, Look};

use crate::backtrack;
use crate::charclass::Phase;
use crate::literal::{starts_with_digit_class, Literals};

/// The primary matching strategy an engine was compiled with. Chosen once
/// at compile time; individual calls may still fall back to the NFA when a
/// run-time budget trips.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// `^literal` or `^literal$`: a byte comparison at position 0.
    AnchoredLiteral,
    /// `^(A|B|…)` over short literals: first-byte dispatch table.
    BranchDispatch,
    /// End-anchored pattern: one reverse scan from the end.
    ReverseAnchored,
    /// 2–32 suffix literals without a common tail.
    ReverseSuffixSet,
    /// One strong suffix literal.
    ReverseSuffix,
    /// Multiline `^…suffix`: suffix hit locates the line, forward NFA
    /// verifies.
    MultilineReverseSuffix,
    /// Strong interior literal with pattern on both sides.
    ReverseInner,
    /// Literal prefix prefilter (packed SIMD / substring / byte scan).
    Teddy,
    /// More prefix literals than the packed searcher takes.
    AhoCorasick,
    /// Digit-class scan with adaptive abandonment.
    DigitPrefilter,
    /// Concatenated byte-class repetitions.
    CompositeSearcher,
    /// A single repeated byte class.
    CharClassSearcher,
    /// Bounded backtracking; pays off on small programs with captures.
    BoundedBacktracker,
    /// Medium automaton: backtracker on small inputs, lazy DFA otherwise.
    Both,
    /// Lazy DFA with NFA fallback.
    Dfa,
    /// The NFA simulation alone.
    Nfa,
}

/// Everything the selector looks at, assembled by the engine after the
/// compile pipeline has run.
#[derive(Debug)]
pub struct Facts<'a> {
    pub hir: &'a Hir,
    pub lits: &'a Literals,
    pub ncaps: usize,
    pub insts_len: usize,
    /// Instruction count of the ASCII-restricted program, when one was
    /// compiled; `usize::MAX` otherwise. The backtracker budget looks at
    /// whichever program is smaller.
    pub ascii_insts_len: usize,
    pub anchored_begin: bool,
    pub anchored_end: bool,
    pub multiline_start: bool,
    /// DFAs can be built (enabled and no word boundaries).
    pub dfa_ok: bool,
    /// The inner-literal split compiled into DFA-capable programs.
    pub inner_ok: bool,
    pub prefilter: bool,
}

/// Pick the primary strategy. First matching row wins.
pub fn select(f: &Facts) -> Strategy {
    let strat = select_(f);
    debug!(
        "selected strategy {:?} (insts={}, ncaps={}, prefixes={}, suffixes={}, inner={})",
        strat,
        f.insts_len,
        f.ncaps,
        f.lits.prefixes.len(),
        f.lits.suffixes.len(),
        f.lits.inner.is_some(),
    );
    strat
}

fn select_(f: &Facts) -> Strategy {
    let pre = &f.lits.prefixes;
    let suf = &f.lits.suffixes;
    if anchored_literal_shape(f.hir).is_some() {
        return Strategy::AnchoredLiteral;
    }
    if branch_shape(f.hir).is_some() {
        return Strategy::BranchDispatch;
    }
    if f.anchored_end && !f.anchored_begin && !f.multiline_start && f.dfa_ok {
        return Strategy::ReverseAnchored;
    }
    let plain = !f.anchored_begin && !f.anchored_end && !f.multiline_start;
    if plain && f.dfa_ok && f.prefilter && class_star_prefix(f.hir).is_some() {
        if suf.len() >= 2
            && suf.len() <= 32
            && suf.min_len() >= 2
            && suf.longest_common_suffix().is_empty()
        {
            return Strategy::ReverseSuffixSet;
        }
        if suf.len() == 1 && suf.min_len() >= 2 {
            return Strategy::ReverseSuffix;
        }
    }
    if f.multiline_start
        && f.prefilter
        && !suf.is_empty()
        && suf.len() <= 32
        && suf.min_len() >= 2
    {
        return Strategy::MultilineReverseSuffix;
    }
    if plain && f.prefilter && f.inner_ok {
        if let Some(ref inner) = f.lits.inner {
            if inner.lits.min_len() >= 3 {
                return Strategy::ReverseInner;
            }
        }
    }
    if f.prefilter && !pre.is_empty() && pre.len() <= 32 {
        if pre.len() == 1 || pre.min_len() >= 2 {
            return Strategy::Teddy;
        }
    }
    if f.prefilter && pre.len() > 32 {
        return Strategy::AhoCorasick;
    }
    if f.prefilter
        && pre.max_len() <= 1
        && !f.anchored_begin
        && starts_with_digit_class(f.hir)
    {
        return Strategy::DigitPrefilter;
    }
    if let Some(phases) = composite_phases(f.hir) {
        if phases.len() >= 2 {
            return Strategy::CompositeSearcher;
        }
        return Strategy::CharClassSearcher;
    }
    if f.ncaps > 1
        && f.insts_len.min(f.ascii_insts_len) <= backtrack::PROG_SIZE_LIMIT
    {
        return Strategy::BoundedBacktracker;
    }
    if f.dfa_ok && f.insts_len <= backtrack::PROG_SIZE_LIMIT {
        return Strategy::Both;
    }
    if f.dfa_ok {
        return Strategy::Dfa;
    }
    Strategy::Nfa
}

/// `^lit` / `^lit$` with nothing but literal bytes in between.
pub fn anchored_literal_shape(hir: &Hir) -> Option<(Vec<u8>, bool)> {
    let subs = match *hir.kind() {
        HirKind::Concat(ref subs) => subs,
        _ => return None,
    };
    if subs.len() < 2 || !matches!(*subs[0].kind(), HirKind::Look(Look::Start)) {
        return None;
    }
    let mut lit = vec![];
    let mut end_anchored = false;
    for (i, sub) in subs[1..].iter().enumerate() {
        match *sub.kind() {
            HirKind::Literal(ref l) => lit.extend_from_slice(&l.0),
            HirKind::Look(Look::End) if i + 2 == subs.len() => {
                end_anchored = true;
            }
            _ => return None,
        }
    }
    if lit.is_empty() {
        return None;
    }
    Some((lit, end_anchored))
}

/// `^(A|B|…)` with at most 16 short literal branches.
pub fn branch_shape(hir: &Hir) -> Option<(Vec<Vec<u8>>, bool)> {
    let subs = match *hir.kind() {
        HirKind::Concat(ref subs) => subs,
        _ => return None,
    };
    if !matches!(*subs.first()?.kind(), HirKind::Look(Look::Start)) {
        return None;
    }
    let (alt, end_anchored) = match subs.len() {
        2 => (&subs[1], false),
        3 if matches!(*subs[2].kind(), HirKind::Look(Look::End)) => {
            (&subs[1], true)
        }
        _ => return None,
    };
    let alt = match *alt.kind() {
        HirKind::Capture(ref cap) => &cap.sub,
        _ => alt,
    };
    let branches = match *alt.kind() {
        HirKind::Alternation(ref subs) => subs,
        _ => return None,
    };
    if branches.len() > 16 {
        return None;
    }
    let mut lits = vec![];
    for branch in branches {
        let lit = pure_literal(branch)?;
        if lit.is_empty() || lit.len() > 16 {
            return None;
        }
        lits.push(lit);
    }
    Some((lits, end_anchored))
}

fn pure_literal(hir: &Hir) -> Option<Vec<u8>> {
    match *hir.kind() {
        HirKind::Literal(ref l) => Some(l.0.to_vec()),
        HirKind::Concat(ref subs) => {
            let mut lit = vec![];
            for sub in subs {
                lit.extend(pure_literal(sub)?);
            }
            Some(lit)
        }
        _ => None,
    }
}

/// The leading class-star (`.*`, `[a-z]*`) of a concatenation, if that is
/// what the pattern starts with. The reverse-suffix searchers rely on this
/// shape: with a class-star prefix, the leftmost suffix occurrence always
/// yields the leftmost match start.
pub fn class_star_prefix(hir: &Hir) -> Option<&Hir> {
    let subs = match *hir.kind() {
        HirKind::Concat(ref subs) => subs,
        _ => return None,
    };
    let first = subs.first()?;
    match *first.kind() {
        HirKind::Repetition(ref rep)
            if rep.min == 0
                && rep.max.is_none()
                && matches!(*rep.sub.kind(), HirKind::Class(_)) =>
        {
            Some(first)
        }
        _ => None,
    }
}

/// Decompose the whole pattern into byte-class repetition phases, if it is
/// nothing else. A single phase drives the streaming class searcher; two
/// to four phases drive the composite searcher.
pub fn composite_phases(hir: &Hir) -> Option<Vec<Phase>> {
    match *hir.kind() {
        HirKind::Concat(ref subs) => {
            if subs.len() > 4 {
                return None;
            }
            subs.iter().map(Phase::from_hir).collect()
        }
        _ => Phase::from_hir(hir).map(|p| vec![p]),
    }
}

#[cfg(test)]
mod tests {
    use regex_syntax::ParserBuilder;

    use super::*;
    use crate::literal;

    fn facts_select(pattern: &str) -> Strategy {
        let hir = ParserBuilder::new().build().parse(pattern).unwrap();
        let lits = literal::extract(&hir, 64);
        let props = hir.properties();
        let p = crate::compile::Compiler::new(1 << 20).compile(&hir).unwrap();
        let ascii = crate::compile::Compiler::new(1 << 20)
            .ascii(true)
            .compile(&hir)
            .unwrap();
        let (insts_len, has_wb) = (p.insts.len(), p.has_word_boundary);
        let f = Facts {
            hir: &hir,
            lits: &lits,
            ncaps: 1 + props.explicit_captures_len(),
            insts_len,
            ascii_insts_len: ascii.insts.len(),
            anchored_begin: props.look_set_prefix().contains(Look::Start),
            anchored_end: props.look_set_suffix().contains(Look::End),
            multiline_start: props.look_set_prefix().contains(Look::StartLF),
            dfa_ok: !has_wb,
            inner_ok: lits.inner.is_some(),
            prefilter: true,
        };
        select(&f)
    }

    #[test]
    fn table_order() {
        assert_eq!(facts_select("^foo"), Strategy::AnchoredLiteral);
        assert_eq!(facts_select("^foo$"), Strategy::AnchoredLiteral);
        assert_eq!(facts_select("^(GET|PUT|POST)"), Strategy::BranchDispatch);
        assert_eq!(facts_select("foo.*bar$"), Strategy::ReverseAnchored);
        assert_eq!(facts_select(r".*\.(txt|log|md)"), Strategy::ReverseSuffixSet);
        assert_eq!(facts_select(r".*\.txt"), Strategy::ReverseSuffix);
        assert_eq!(
            facts_select(r"(?m)^/.*\.php"),
            Strategy::MultilineReverseSuffix
        );
        assert_eq!(facts_select(".*connection.*"), Strategy::ReverseInner);
        assert_eq!(facts_select("foo|bar|baz"), Strategy::Teddy);
        assert_eq!(facts_select(r"\d+\.\d+\.\d+"), Strategy::DigitPrefilter);
        assert_eq!(facts_select("[a-z]+[0-9]+"), Strategy::CompositeSearcher);
        assert_eq!(facts_select("[a-z]+"), Strategy::CharClassSearcher);
        assert_eq!(
            facts_select(r"(\w+)@(\w+)\.(\w+)"),
            Strategy::BoundedBacktracker
        );
    }

    #[test]
    fn fallback_rows() {
        // No captures, no usable literals, small program: adaptive.
        assert_eq!(facts_select(".a."), Strategy::Both);
        // Word boundaries rule the DFA out; a big classy program lands on
        // the plain NFA.
        assert_eq!(facts_select(r"\b[^y]{101}\b"), Strategy::Nfa);
    }
}
