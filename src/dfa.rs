// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// A lazy DFA. States are sets of NFA instructions discovered by subset
// construction *during* the search, cached up to a fixed budget. When the
// budget runs out the search reports `Fail` and the caller reruns the call
// on the NFA simulation; a DFA answer is therefore always authoritative,
// while a `Fail` is merely inconvenient.
//
// Zero-width assertions are resolved when a transition is computed: at that
// moment both sides of the boundary are known (the state remembers what
// preceded it, the input byte is in hand). Word boundaries need character
// context the byte-at-a-time machinery cannot provide, so programs
// containing them never build a DFA at all.

use std::collections::HashMap;

use crate::inst::{EmptyLook, Inst, InstIdx};
use crate::program::Program;

/// The result of a DFA search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DfaResult {
    Match(usize),
    NoMatch,
    /// The state cache filled up (or a state blew the determinization
    /// limit). The caller must rerun the call on the NFA.
    Fail,
}

/// The result of a limited reverse scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevLimited {
    Match(usize),
    NoMatch,
    /// The scan would re-enter a region already proven to contain no match
    /// start. Continuing risks quadratic work; the caller must switch to
    /// the NFA for this call.
    Quadratic,
    Fail,
}

type StateID = u32;

const DEAD: StateID = 0;
const UNKNOWN: StateID = u32::MAX;

/// What preceded the boundary a state sits on. Distinguishing these three
/// cases is all the context the supported assertions ever need on the
/// lookbehind side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Ctx {
    Begin,
    Newline,
    Other,
}

impl Ctx {
    fn of(hay: &[u8], at: usize) -> Ctx {
        if at == 0 {
            Ctx::Begin
        } else if hay[at - 1] == b'\n' {
            Ctx::Newline
        } else {
            Ctx::Other
        }
    }

    fn after(b: u8) -> Ctx {
        if b == b'\n' {
            Ctx::Newline
        } else {
            Ctx::Other
        }
    }

    fn index(self) -> usize {
        match self {
            Ctx::Begin => 0,
            Ctx::Newline => 1,
            Ctx::Other => 2,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Tran {
    next: StateID,
    matched: bool,
}

#[derive(Clone, Debug)]
struct State {
    insts: Box<[u32]>,
    ctx: Ctx,
}

/// A lazy DFA over one program. The forward flavor reports leftmost-first
/// match ends; the reverse flavor runs the reverse program with longest
/// semantics to find leftmost match starts.
#[derive(Clone, Debug)]
pub struct Dfa<'r> {
    prog: &'r Program,
    longest: bool,
    max_states: usize,
    determinize_limit: usize,
}

/// The mutable half of a lazy DFA, pooled inside a SearchState. Each cache
/// is owned by exactly one search at a time, so filling it requires no
/// synchronization; the budget and the cache-full signal behave the same
/// as a shared table would.
#[derive(Clone, Debug)]
pub struct DfaCache {
    states: Vec<State>,
    map: HashMap<(Box<[u32]>, Ctx), StateID>,
    trans: Vec<Tran>,
    stride: usize,
    starts: [[StateID; 3]; 2],
    seen: SparseSet,
    scratch: Vec<u32>,
}

impl DfaCache {
    pub fn new() -> DfaCache {
        DfaCache {
            states: vec![],
            map: HashMap::new(),
            trans: vec![],
            stride: 0,
            starts: [[UNKNOWN; 3]; 2],
            seen: SparseSet::new(0),
            scratch: vec![],
        }
    }

    fn reset(&mut self, prog: &Program) {
        self.states.clear();
        self.map.clear();
        self.trans.clear();
        self.stride = prog.nclasses + 1;
        self.starts = [[UNKNOWN; 3]; 2];
        self.seen.resize(prog.insts.len());
        // State 0 is the dead state. Every transition out of it loops back.
        self.states.push(State { insts: Box::new([]), ctx: Ctx::Other });
        self.trans
            .extend(std::iter::repeat(Tran { next: DEAD, matched: false }).take(self.stride));
    }

    fn is_fresh(&self) -> bool {
        self.states.is_empty()
    }
}

impl<'r> Dfa<'r> {
    /// Returns true iff a DFA can be built for the given program.
    pub fn can_build(prog: &Program) -> bool {
        !prog.has_word_boundary
    }

    pub fn forward(
        prog: &'r Program,
        max_states: usize,
        determinize_limit: usize,
    ) -> Dfa<'r> {
        Dfa { prog, longest: false, max_states, determinize_limit }
    }

    pub fn reverse(
        prog: &'r Program,
        max_states: usize,
        determinize_limit: usize,
    ) -> Dfa<'r> {
        Dfa { prog, longest: true, max_states, determinize_limit }
    }

    /// Find the end of the leftmost match with start >= `at`, scanning
    /// forward. With `anchored`, the match must begin exactly at `at`.
    /// With `earliest`, the first match boundary seen is returned, which
    /// is enough for existence tests.
    pub fn find_end(
        &self,
        cache: &mut DfaCache,
        hay: &[u8],
        at: usize,
        anchored: bool,
        earliest: bool,
    ) -> DfaResult {
        if cache.is_fresh() || cache.stride != self.prog.nclasses + 1 {
            cache.reset(self.prog);
        }
        let entry = if anchored {
            self.prog.start
        } else {
            self.prog.start_unanchored
        };
        let mut sid = match self.start_state(cache, entry, anchored, Ctx::of(hay, at)) {
            Some(sid) => sid,
            None => return DfaResult::Fail,
        };
        let mut last_match = None;
        for i in at..hay.len() {
            let b = hay[i];
            let tran = match self.next(cache, sid, b) {
                Some(tran) => tran,
                None => return DfaResult::Fail,
            };
            if tran.matched {
                last_match = Some(i);
                if earliest {
                    return DfaResult::Match(i);
                }
            }
            sid = tran.next;
            if sid == DEAD {
                return match last_match {
                    Some(e) => DfaResult::Match(e),
                    None => DfaResult::NoMatch,
                };
            }
        }
        if self.boundary_match(cache, sid, None) {
            last_match = Some(hay.len());
        }
        match last_match {
            Some(e) => DfaResult::Match(e),
            None => DfaResult::NoMatch,
        }
    }

    /// Find the start of a match that ends at `rev_end`, scanning the
    /// reverse program backward but not below `at`. Longest semantics:
    /// the deepest (smallest) matching boundary wins.
    pub fn find_start(
        &self,
        cache: &mut DfaCache,
        hay: &[u8],
        at: usize,
        rev_end: usize,
    ) -> DfaResult {
        match self.rev_scan(cache, hay, at, rev_end, 0) {
            RevLimited::Match(s) => DfaResult::Match(s),
            RevLimited::NoMatch => DfaResult::NoMatch,
            RevLimited::Fail => DfaResult::Fail,
            RevLimited::Quadratic => unreachable!("unlimited scan cannot trip the guard"),
        }
    }

    /// Like `find_start`, but gives up with `Quadratic` as soon as the scan
    /// crosses below `min_start` without having found a match boundary.
    pub fn search_reverse_limited(
        &self,
        cache: &mut DfaCache,
        hay: &[u8],
        at: usize,
        rev_end: usize,
        min_start: usize,
    ) -> RevLimited {
        self.rev_scan(cache, hay, at, rev_end, min_start)
    }

    fn rev_scan(
        &self,
        cache: &mut DfaCache,
        hay: &[u8],
        at: usize,
        rev_end: usize,
        min_start: usize,
    ) -> RevLimited {
        debug_assert!(at <= rev_end && rev_end <= hay.len());
        if cache.is_fresh() || cache.stride != self.prog.nclasses + 1 {
            cache.reset(self.prog);
        }
        // The match must end exactly at rev_end, so the reverse program is
        // always entered anchored. The lookbehind of the reversed stream is
        // the byte just after rev_end in forward order.
        let ctx = if rev_end == hay.len() {
            Ctx::Begin
        } else if hay[rev_end] == b'\n' {
            Ctx::Newline
        } else {
            Ctx::Other
        };
        let mut sid = match self.start_state(cache, self.prog.start, true, ctx) {
            Some(sid) => sid,
            None => return RevLimited::Fail,
        };
        let mut last_match = None;
        let mut j = rev_end;
        while j > at {
            if j < min_start {
                // Everything below min_start was ruled out by an earlier
                // scan. A match recorded above it is the final answer; with
                // none, continuing would redo that earlier work.
                return match last_match {
                    Some(s) => RevLimited::Match(s),
                    None => RevLimited::Quadratic,
                };
            }
            let b = hay[j - 1];
            let tran = match self.next(cache, sid, b) {
                Some(tran) => tran,
                None => return RevLimited::Fail,
            };
            if tran.matched {
                last_match = Some(j);
            }
            sid = tran.next;
            if sid == DEAD {
                return match last_match {
                    Some(s) => RevLimited::Match(s),
                    None => RevLimited::NoMatch,
                };
            }
            j -= 1;
        }
        // The scan stopped at `at`. A match boundary exactly there is still
        // possible; resolve it against the byte before `at`, or against the
        // text start when there is none.
        let next = if at == 0 { None } else { Some(hay[at - 1]) };
        if self.boundary_match(cache, sid, next) {
            last_match = Some(at);
        }
        match last_match {
            Some(s) => RevLimited::Match(s),
            None => RevLimited::NoMatch,
        }
    }

    /// Fetch or compute the start state for the given entry point and
    /// lookbehind context. Returns `None` on cache exhaustion.
    fn start_state(
        &self,
        cache: &mut DfaCache,
        entry: InstIdx,
        anchored: bool,
        ctx: Ctx,
    ) -> Option<StateID> {
        let slot = (anchored as usize, ctx.index());
        let cached = cache.starts[slot.0][slot.1];
        if cached != UNKNOWN {
            return Some(cached);
        }
        cache.seen.clear();
        cache.scratch.clear();
        let mut scratch = std::mem::take(&mut cache.scratch);
        self.expand(cache, &[entry as u32], &mut scratch);
        let sid = self.intern(cache, &scratch, ctx);
        cache.scratch = scratch;
        if let Some(sid) = sid {
            cache.starts[slot.0][slot.1] = sid;
        }
        sid
    }

    /// Compute (or fetch) the transition out of `sid` on `b`. End-of-input
    /// boundaries go through `boundary_match` instead.
    fn next(&self, cache: &mut DfaCache, sid: StateID, b: u8) -> Option<Tran> {
        let class = self.prog.byte_classes[b as usize] as usize;
        let idx = sid as usize * cache.stride + class;
        let cached = cache.trans[idx];
        if cached.next != UNKNOWN {
            return Some(cached);
        }
        let (matched, consumed) = self.scan_boundary(cache, sid, Some(b));
        let mut scratch = std::mem::take(&mut cache.scratch);
        scratch.clear();
        cache.seen.clear();
        self.expand(cache, &consumed, &mut scratch);
        let next = self.intern(cache, &scratch, Ctx::after(b));
        cache.scratch = scratch;
        let next = next?;
        let tran = Tran { next, matched };
        cache.trans[sid as usize * cache.stride + class] = tran;
        Some(tran)
    }

    /// Whether a match boundary occurs at the position state `sid` sits on,
    /// given the byte (or end of input) that follows it.
    fn boundary_match(&self, cache: &mut DfaCache, sid: StateID, next: Option<u8>) -> bool {
        let (matched, _) = self.scan_boundary(cache, sid, next);
        matched
    }

    /// Walk the state's instructions in priority order with full boundary
    /// context. Returns whether a match occurs at this boundary and the
    /// list of instruction targets that consumed `next`.
    fn scan_boundary(
        &self,
        cache: &mut DfaCache,
        sid: StateID,
        next: Option<u8>,
    ) -> (bool, Vec<u32>) {
        let ctx = cache.states[sid as usize].ctx;
        let insts = cache.states[sid as usize].insts.clone();
        let mut consumed = vec![];
        let mut matched = false;
        let mut stack: Vec<InstIdx> = insts.iter().rev().map(|&pc| pc as InstIdx).collect();
        cache.seen.clear();
        while let Some(pc) = stack.pop() {
            if cache.seen.contains(pc) {
                continue;
            }
            cache.seen.insert(pc);
            match self.prog.insts[pc] {
                Inst::Match => {
                    matched = true;
                    if !self.longest {
                        break;
                    }
                }
                Inst::Save(ref inst) => stack.push(inst.goto),
                Inst::Split(ref inst) => {
                    stack.push(inst.goto2);
                    stack.push(inst.goto1);
                }
                Inst::EmptyLook(ref inst) => {
                    if self.look_holds(inst.look, ctx, next) {
                        stack.push(inst.goto);
                    }
                }
                Inst::Bytes(ref inst) => {
                    if let Some(b) = next {
                        if inst.matches(b) {
                            consumed.push(inst.goto as u32);
                        }
                    }
                }
            }
        }
        (matched, consumed)
    }

    fn look_holds(&self, look: EmptyLook, ctx: Ctx, next: Option<u8>) -> bool {
        match look {
            EmptyLook::StartText => ctx == Ctx::Begin,
            EmptyLook::StartLine => ctx != Ctx::Other,
            EmptyLook::EndText => next.is_none(),
            EmptyLook::EndLine => next.is_none() || next == Some(b'\n'),
            EmptyLook::WordBoundary | EmptyLook::NotWordBoundary => {
                unreachable!("word boundaries never reach the DFA")
            }
        }
    }

    /// Expand split and save instructions from the given entry points,
    /// collecting the byte, assertion and match instructions where subset
    /// construction stops. Under leftmost-first, everything of lower
    /// priority than a match is discarded.
    fn expand(&self, cache: &mut DfaCache, entries: &[u32], out: &mut Vec<u32>) {
        let mut stack: Vec<InstIdx> =
            entries.iter().rev().map(|&pc| pc as InstIdx).collect();
        while let Some(pc) = stack.pop() {
            if cache.seen.contains(pc) {
                continue;
            }
            cache.seen.insert(pc);
            match self.prog.insts[pc] {
                Inst::Save(ref inst) => stack.push(inst.goto),
                Inst::Split(ref inst) => {
                    stack.push(inst.goto2);
                    stack.push(inst.goto1);
                }
                Inst::Match => {
                    out.push(pc as u32);
                    if !self.longest {
                        return;
                    }
                }
                Inst::EmptyLook(_) | Inst::Bytes(_) => out.push(pc as u32),
            }
        }
    }

    /// Find or create the cache entry for a state. Returns `None` when the
    /// state budget or the determinization limit is exhausted.
    fn intern(&self, cache: &mut DfaCache, insts: &[u32], ctx: Ctx) -> Option<StateID> {
        if insts.is_empty() {
            return Some(DEAD);
        }
        if insts.len() > self.determinize_limit {
            return None;
        }
        let key = (insts.to_vec().into_boxed_slice(), ctx);
        if let Some(&sid) = cache.map.get(&key) {
            return Some(sid);
        }
        if cache.states.len() >= self.max_states {
            return None;
        }
        let sid = cache.states.len() as StateID;
        cache.states.push(State { insts: key.0.clone(), ctx });
        cache.map.insert(key, sid);
        cache
            .trans
            .extend(std::iter::repeat(Tran { next: UNKNOWN, matched: false }).take(cache.stride));
        Some(sid)
    }
}

/// A sparse set of instruction indices with O(1) insert, lookup and clear.
#[derive(Clone, Debug)]
struct SparseSet {
    dense: Vec<usize>,
    sparse: Vec<usize>,
}

impl SparseSet {
    fn new(capacity: usize) -> SparseSet {
        SparseSet { dense: Vec::with_capacity(capacity), sparse: vec![0; capacity] }
    }

    fn resize(&mut self, capacity: usize) {
        if self.sparse.len() < capacity {
            self.sparse.resize(capacity, 0);
        }
        self.dense.clear();
    }

    fn insert(&mut self, value: usize) {
        self.sparse[value] = self.dense.len();
        self.dense.push(value);
    }

    fn contains(&self, value: usize) -> bool {
        let i = self.sparse[value];
        i < self.dense.len() && self.dense[i] == value
    }

    fn clear(&mut self) {
        self.dense.clear();
    }
}

#[cfg(test)]
mod tests {
    use regex_syntax::ParserBuilder;

    use super::{Dfa, DfaCache, DfaResult, RevLimited};
    use crate::compile::Compiler;
    use crate::program::Program;

    fn prog(pattern: &str) -> Program {
        let hir = ParserBuilder::new().build().parse(pattern).unwrap();
        Compiler::new(1 << 20).compile(&hir).unwrap()
    }

    fn rev_prog(pattern: &str) -> Program {
        let hir = ParserBuilder::new().build().parse(pattern).unwrap();
        Compiler::new(1 << 20).reverse(true).compile(&hir).unwrap()
    }

    fn end_of(pattern: &str, hay: &str) -> DfaResult {
        let p = prog(pattern);
        let dfa = Dfa::forward(&p, 10_000, 1_000);
        let mut cache = DfaCache::new();
        dfa.find_end(&mut cache, hay.as_bytes(), 0, false, false)
    }

    #[test]
    fn forward_ends() {
        assert_eq!(end_of("abc", "xabcy"), DfaResult::Match(4));
        assert_eq!(end_of("a+", "baaa"), DfaResult::Match(4));
        assert_eq!(end_of("a|ab", "ab"), DfaResult::Match(1));
        assert_eq!(end_of("ab|a", "ab"), DfaResult::Match(2));
        assert_eq!(end_of("z", "abc"), DfaResult::NoMatch);
    }

    #[test]
    fn anchors() {
        assert_eq!(end_of("^b", "ab"), DfaResult::NoMatch);
        assert_eq!(end_of("^a", "ab"), DfaResult::Match(1));
        assert_eq!(end_of("b$", "ab"), DfaResult::Match(2));
        assert_eq!(end_of("(?m)^b", "a\nb"), DfaResult::Match(3));
        assert_eq!(end_of("(?m)a$", "a\nb"), DfaResult::Match(1));
    }

    #[test]
    fn reverse_starts() {
        let p = rev_prog("a+b");
        let dfa = Dfa::reverse(&p, 10_000, 1_000);
        let mut cache = DfaCache::new();
        // Forward match of a+b in "xaaab" is (1, 5); reverse scan from the
        // end should find the start at 1.
        assert_eq!(dfa.find_start(&mut cache, b"xaaab", 0, 5), DfaResult::Match(1));
    }

    #[test]
    fn limited_scan_trips_guard() {
        let p = rev_prog("a+");
        let dfa = Dfa::reverse(&p, 10_000, 1_000);
        let mut cache = DfaCache::new();
        let hay = b"bbbbbbbbaa";
        // Scanning for a start below min_start=9 without a match on the way
        // must trip the quadratic guard rather than walk to position 0.
        match dfa.search_reverse_limited(&mut cache, hay, 0, 8, 9) {
            RevLimited::Quadratic => {}
            r => panic!("expected quadratic sentinel, got {:?}", r),
        }
    }

    #[test]
    fn tiny_cache_fails_over() {
        let p = prog("abcde");
        let dfa = Dfa::forward(&p, 3, 1_000);
        let mut cache = DfaCache::new();
        assert_eq!(
            dfa.find_end(&mut cache, b"abcde", 0, false, false),
            DfaResult::Fail
        );
    }

    #[test]
    fn unicode_class_ends() {
        assert_eq!(end_of(r"\w+", "·héllo·"), DfaResult::Match(8));
    }
}
