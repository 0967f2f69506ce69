// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::trace;
use memchr::memmem;
use regex_syntax::hir::{Hir, Look};
use regex_syntax::ParserBuilder;

use crate::anchored::{AnchoredLiteral, BranchDispatch};
use crate::backtrack::{BacktrackCache, Backtracker};
use crate::charclass::{CharClassSearcher, CompositeSearcher};
use crate::compile::Compiler;
use crate::dfa::{Dfa, DfaCache, DfaResult};
use crate::error::Error;
use crate::literal::{self, Literals};
use crate::nfa::{Nfa, NfaThreads};
use crate::onepass::OnePass;
use crate::pool::Pool;
use crate::prefilter::Prefilter;
use crate::program::Program;
use crate::reverse::{self, Attempt, PrefixKind};
use crate::stats::{Stats, StatsSnapshot};
use crate::strategy::{self, Facts, Strategy};

/// How many consecutive failed prefilter candidates the digit searcher
/// tolerates before abandoning the prefilter for the rest of the call.
const PREFILTER_ABANDON_LIMIT: u32 = 64;

/// Engine configuration. All options have sensible defaults; setters
/// consume and return `self` so a configuration reads as one expression.
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) dfa: bool,
    pub(crate) prefilter: bool,
    pub(crate) max_dfa_states: usize,
    pub(crate) determinize_limit: usize,
    pub(crate) min_literal_len: usize,
    pub(crate) max_literals: usize,
    pub(crate) max_recursion_depth: u32,
    pub(crate) ascii_optimization: bool,
    pub(crate) size_limit: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            dfa: true,
            prefilter: true,
            max_dfa_states: 10_000,
            determinize_limit: 1_000,
            min_literal_len: 1,
            max_literals: 64,
            max_recursion_depth: 250,
            ascii_optimization: true,
            size_limit: 10 * (1 << 20),
        }
    }
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    /// Include lazy DFAs in the engine. When disabled, strategies that
    /// depend on a DFA degrade to NFA-based ones.
    pub fn dfa(mut self, yes: bool) -> Config {
        self.dfa = yes;
        self
    }

    /// Build literal prefilters. When disabled, every search goes through
    /// a full automaton.
    pub fn prefilter(mut self, yes: bool) -> Config {
        self.prefilter = yes;
        self
    }

    /// Cap on cached DFA states; exceeding it makes a call fall back to
    /// the NFA.
    pub fn max_dfa_states(mut self, n: usize) -> Config {
        self.max_dfa_states = n;
        self
    }

    /// Cap on NFA states per DFA state during subset construction.
    pub fn determinize_limit(mut self, n: usize) -> Config {
        self.determinize_limit = n;
        self
    }

    /// Minimum literal length considered for a prefilter.
    pub fn min_literal_len(mut self, n: usize) -> Config {
        self.min_literal_len = n;
        self
    }

    /// Cap on extracted literals.
    pub fn max_literals(mut self, n: usize) -> Config {
        self.max_literals = n;
        self
    }

    /// Parser recursion (nesting) limit.
    pub fn max_recursion_depth(mut self, n: u32) -> Config {
        self.max_recursion_depth = n;
        self
    }

    /// Compile an ASCII-restricted second program and prefer it on
    /// all-ASCII haystacks.
    pub fn ascii_optimization(mut self, yes: bool) -> Config {
        self.ascii_optimization = yes;
        self
    }

    /// Cap on the compiled program size, in bytes.
    pub fn size_limit(mut self, n: usize) -> Config {
        self.size_limit = n;
        self
    }

    fn validate(&self) -> Result<(), Error> {
        if self.max_dfa_states < 3 {
            return Err(Error::Config(format!(
                "max_dfa_states must be at least 3, got {}",
                self.max_dfa_states
            )));
        }
        for (name, v) in [
            ("determinize_limit", self.determinize_limit),
            ("min_literal_len", self.min_literal_len),
            ("max_literals", self.max_literals),
            ("max_recursion_depth", self.max_recursion_depth as usize),
            ("size_limit", self.size_limit),
        ] {
            if v < 1 {
                return Err(Error::Config(format!("{} must be at least 1", name)));
            }
        }
        Ok(())
    }
}

/// Pooled per-search scratch: thread lists for the NFA, the backtracker's
/// bitmap, one lazy-DFA cache per compiled program, and a slot buffer.
/// Acquired at the start of every operation and returned on all exit
/// paths; allocations survive round trips through the pool, so steady
/// state searches allocate nothing.
#[derive(Debug)]
pub struct SearchState {
    nfa: NfaThreads,
    back: BacktrackCache,
    fdfa: DfaCache,
    rdfa: DfaCache,
    pdfa: DfaCache,
    sdfa: DfaCache,
}

impl SearchState {
    fn new() -> SearchState {
        SearchState {
            nfa: NfaThreads::new(),
            back: BacktrackCache::new(),
            fdfa: DfaCache::new(),
            rdfa: DfaCache::new(),
            pdfa: DfaCache::new(),
            sdfa: DfaCache::new(),
        }
    }
}

/// A compiled multi-strategy regex engine.
///
/// Compilation builds every artifact the chosen strategy needs (programs,
/// literal sets, prefilters, split programs for interior literals, a
/// one-pass table) and freezes. Searches share the engine across threads
/// freely; per-call scratch comes from an internal pool.
pub struct Engine {
    config: Config,
    pattern: String,
    strategy: Strategy,
    prog: Program,
    ascii_prog: Option<Program>,
    rev_prog: Option<Program>,
    inner_prefix_prog: Option<Program>,
    inner_suffix_prog: Option<Program>,
    pre_prefix: Option<Prefilter>,
    pre_suffix: Option<Prefilter>,
    pre_inner: Option<Prefilter>,
    suffix_finder: Option<memmem::Finder<'static>>,
    prefix_kind: Option<PrefixKind>,
    anchored_lit: Option<AnchoredLiteral>,
    branch: Option<BranchDispatch>,
    charclass: Option<CharClassSearcher>,
    composite: Option<CompositeSearcher>,
    onepass: Option<OnePass>,
    complete_prefilter: bool,
    cap_names: Arc<Vec<Option<String>>>,
    longest: AtomicBool,
    stats: Stats,
    pool: Pool<SearchState>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("pattern", &self.pattern)
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// A single match, borrowing the haystack it was found in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match<'h> {
    hay: &'h [u8],
    start: usize,
    end: usize,
}

impl<'h> Match<'h> {
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_bytes(&self) -> &'h [u8] {
        &self.hay[self.start..self.end]
    }
}

/// A match with capture groups. Group 0 is the whole match; a group that
/// did not participate is absent.
#[derive(Clone, Debug)]
pub struct Captures<'h> {
    hay: &'h [u8],
    slots: Vec<Option<usize>>,
    names: Arc<Vec<Option<String>>>,
}

impl<'h> Captures<'h> {
    /// The number of groups, including group 0.
    pub fn len(&self) -> usize {
        self.slots.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<Match<'h>> {
        let (s, e) = (*self.slots.get(2 * i)?, *self.slots.get(2 * i + 1)?);
        match (s, e) {
            (Some(start), Some(end)) => {
                Some(Match { hay: self.hay, start, end })
            }
            _ => None,
        }
    }

    pub fn name(&self, name: &str) -> Option<Match<'h>> {
        let i = self
            .names
            .iter()
            .position(|n| n.as_deref() == Some(name))?;
        self.get(i)
    }
}

pub fn compile(pattern: &str) -> Result<Engine, Error> {
    Engine::compile(pattern)
}

pub fn compile_with_config(pattern: &str, config: Config) -> Result<Engine, Error> {
    Engine::compile_with_config(pattern, config)
}

impl Engine {
    pub fn compile(pattern: &str) -> Result<Engine, Error> {
        Engine::compile_with_config(pattern, Config::default())
    }

    pub fn compile_with_config(
        pattern: &str,
        config: Config,
    ) -> Result<Engine, Error> {
        config.validate()?;
        let hir = ParserBuilder::new()
            .nest_limit(config.max_recursion_depth)
            .build()
            .parse(pattern)?;

        let prog = Compiler::new(config.size_limit).compile(&hir)?;
        let ascii_prog = if config.ascii_optimization {
            let ascii =
                Compiler::new(config.size_limit).ascii(true).compile(&hir)?;
            if ascii.insts.len() < prog.insts.len() {
                Some(ascii)
            } else {
                None
            }
        } else {
            None
        };
        let dfa_ok = config.dfa && Dfa::can_build(&prog);
        let rev_prog = if dfa_ok {
            Some(Compiler::new(config.size_limit).reverse(true).compile(&hir)?)
        } else {
            None
        };

        let lits = literal::extract(&hir, config.max_literals);
        let (inner_prefix_prog, inner_suffix_prog, inner_ok) =
            Engine::build_inner(&lits, &config, dfa_ok)?;

        let props = hir.properties();
        let facts = Facts {
            hir: &hir,
            lits: &lits,
            ncaps: prog.ncaps,
            insts_len: prog.insts.len(),
            ascii_insts_len: ascii_prog
                .as_ref()
                .map_or(usize::MAX, |p| p.insts.len()),
            anchored_begin: prog.anchored_begin,
            anchored_end: prog.anchored_end,
            multiline_start: props.look_set_prefix().contains(Look::StartLF),
            dfa_ok,
            inner_ok,
            prefilter: config.prefilter,
        };
        let mut strat = strategy::select(&facts);

        let mut engine = Engine {
            cap_names: Arc::new(prog.cap_names.clone()),
            config,
            pattern: pattern.to_string(),
            strategy: strat,
            prog,
            ascii_prog,
            rev_prog,
            inner_prefix_prog,
            inner_suffix_prog,
            pre_prefix: None,
            pre_suffix: None,
            pre_inner: None,
            suffix_finder: None,
            prefix_kind: None,
            anchored_lit: None,
            branch: None,
            charclass: None,
            composite: None,
            onepass: None,
            complete_prefilter: false,
            longest: AtomicBool::new(false),
            stats: Stats::default(),
            pool: Pool::new(Box::new(SearchState::new)),
        };
        if !engine.build_searchers(&hir, &lits) {
            // A prefilter refused to build (e.g. literals below the
            // configured minimum). Re-select without literal strategies.
            let facts = Facts { prefilter: false, inner_ok: false, ..facts };
            strat = strategy::select(&facts);
            engine.strategy = strat;
            engine.build_searchers(&hir, &lits);
        }
        if engine.prog.anchored_begin {
            engine.onepass = OnePass::build(&engine.prog);
        }
        Ok(engine)
    }

    fn build_inner(
        lits: &Literals,
        config: &Config,
        dfa_ok: bool,
    ) -> Result<(Option<Program>, Option<Program>, bool), Error> {
        let inner = match lits.inner {
            Some(ref inner) if config.prefilter && dfa_ok => inner,
            _ => return Ok((None, None, false)),
        };
        let prefix_rev =
            Compiler::new(config.size_limit).reverse(true).compile(&inner.prefix)?;
        let suffix_fwd = Compiler::new(config.size_limit).compile(&inner.suffix)?;
        let ok = Dfa::can_build(&prefix_rev) && Dfa::can_build(&suffix_fwd);
        if !ok {
            return Ok((None, None, false));
        }
        Ok((Some(prefix_rev), Some(suffix_fwd), true))
    }

    /// Build the artifacts the selected strategy needs. Returns false when
    /// a required prefilter could not be built, in which case the caller
    /// re-selects without literal strategies.
    fn build_searchers(&mut self, hir: &Hir, lits: &Literals) -> bool {
        let min_len = self.config.min_literal_len;
        match self.strategy {
            Strategy::AnchoredLiteral => {
                let (lit, end) = strategy::anchored_literal_shape(hir)
                    .expect("selection verified the shape");
                self.anchored_lit = Some(AnchoredLiteral::new(lit, end));
            }
            Strategy::BranchDispatch => {
                let (branches, end) = strategy::branch_shape(hir)
                    .expect("selection verified the shape");
                self.branch = Some(BranchDispatch::new(branches, end));
            }
            Strategy::ReverseAnchored => {}
            Strategy::ReverseSuffix => {
                let lit = &lits.suffixes.literals()[0];
                self.suffix_finder =
                    Some(memmem::Finder::new(lit).into_owned());
                self.prefix_kind = Some(self.classify_prefix(hir));
            }
            Strategy::ReverseSuffixSet => {
                match Prefilter::build(&lits.suffixes, min_len) {
                    Some(pre) => self.pre_suffix = Some(pre),
                    None => return false,
                }
                self.prefix_kind = Some(self.classify_prefix(hir));
            }
            Strategy::MultilineReverseSuffix => {
                match Prefilter::build(&lits.suffixes, min_len) {
                    Some(pre) => self.pre_suffix = Some(pre),
                    None => return false,
                }
            }
            Strategy::ReverseInner => {
                let inner = lits.inner.as_ref().expect("selection checked");
                match Prefilter::build(&inner.lits, min_len) {
                    Some(pre) => self.pre_inner = Some(pre),
                    None => return false,
                }
                self.prefix_kind = Some(classify_prefix_hir(&inner.prefix));
            }
            Strategy::Teddy | Strategy::AhoCorasick => {
                match Prefilter::build(&lits.prefixes, min_len) {
                    Some(pre) => self.pre_prefix = Some(pre),
                    None => return false,
                }
                self.complete_prefilter = lits.prefixes.is_complete()
                    && hir.properties().look_set().is_empty();
            }
            Strategy::DigitPrefilter => {
                self.pre_prefix = Some(Prefilter::digits());
            }
            Strategy::CharClassSearcher => {
                let phases = strategy::composite_phases(hir)
                    .expect("selection verified the shape");
                self.charclass =
                    Some(CharClassSearcher::new(phases.into_iter().next().unwrap()));
            }
            Strategy::CompositeSearcher => {
                let phases = strategy::composite_phases(hir)
                    .expect("selection verified the shape");
                self.composite = Some(CompositeSearcher::new(phases));
            }
            Strategy::BoundedBacktracker
            | Strategy::Both
            | Strategy::Dfa
            | Strategy::Nfa => {}
        }
        true
    }

    fn classify_prefix(&self, hir: &Hir) -> PrefixKind {
        match strategy::class_star_prefix(hir) {
            Some(prefix) => classify_prefix_hir(prefix),
            None => PrefixKind::General,
        }
    }

    // ---- public search surface ----

    pub fn find<'h>(&self, hay: &'h [u8]) -> Option<Match<'h>> {
        self.find_at(hay, 0)
    }

    pub fn find_at<'h>(&self, hay: &'h [u8], at: usize) -> Option<Match<'h>> {
        let (start, end) = self.find_indices_at(hay, at)?;
        Some(Match { hay, start, end })
    }

    pub fn is_match(&self, hay: &[u8]) -> bool {
        let mut state = self.pool.get();
        let mut slots: [Option<usize>; 0] = [];
        self.exec(&mut state, hay, 0, &mut slots)
    }

    pub fn find_indices(&self, hay: &[u8]) -> Option<(usize, usize)> {
        self.find_indices_at(hay, 0)
    }

    pub fn find_indices_at(&self, hay: &[u8], at: usize) -> Option<(usize, usize)> {
        let mut state = self.pool.get();
        let mut slots = [None, None];
        if self.exec(&mut state, hay, at, &mut slots) {
            Some((slots[0].unwrap(), slots[1].unwrap()))
        } else {
            None
        }
    }

    pub fn find_submatch<'h>(&self, hay: &'h [u8]) -> Option<Captures<'h>> {
        self.find_submatch_at(hay, 0)
    }

    pub fn find_submatch_at<'h>(
        &self,
        hay: &'h [u8],
        at: usize,
    ) -> Option<Captures<'h>> {
        let mut state = self.pool.get();
        let mut slots = vec![None; 2 * self.prog.ncaps];
        if self.exec_captures(&mut state, hay, at, &mut slots) {
            Some(Captures { hay, slots, names: self.cap_names.clone() })
        } else {
            None
        }
    }

    /// All submatches, using the same iteration discipline as the index
    /// iterators. `n <= 0` means no limit.
    pub fn find_all_submatch<'h>(&self, hay: &'h [u8], n: isize) -> Vec<Captures<'h>> {
        let mut out = vec![];
        let mut state = self.pool.get();
        let mut slots = vec![None; 2 * self.prog.ncaps];
        let mut pos = 0usize;
        let mut last_nonempty_end: Option<usize> = None;
        while pos <= hay.len() {
            if !self.exec_captures(&mut state, hay, pos, &mut slots) {
                break;
            }
            let (s, e) = (slots[0].unwrap(), slots[1].unwrap());
            if s == e && Some(e) == last_nonempty_end {
                pos = e + 1;
                continue;
            }
            out.push(Captures {
                hay,
                slots: slots.clone(),
                names: self.cap_names.clone(),
            });
            if e > s {
                last_nonempty_end = Some(e);
                pos = std::cmp::max(e, pos + 1);
            } else {
                pos = e + 1;
            }
            if n > 0 && out.len() >= n as usize {
                break;
            }
        }
        out
    }

    /// All match positions in one pass. The output vector is reused from
    /// `buf` when given; `n <= 0` means no limit.
    pub fn find_all_indices_streaming(
        &self,
        hay: &[u8],
        n: isize,
        buf: Option<Vec<(usize, usize)>>,
    ) -> Vec<(usize, usize)> {
        let mut out = buf.unwrap_or_default();
        out.clear();
        let cap = if self.prog.anchored_begin {
            1
        } else {
            std::cmp::min(256, hay.len() / 100 + 1)
        };
        out.reserve(cap);

        let mut state = self.pool.get();
        // The streaming class searcher emits all matches in one traversal.
        if let Some(ref cc) = self.charclass {
            if !self.longest.load(Ordering::Relaxed) && self.class_tables_apply(hay) {
                let limit = if n <= 0 { 0 } else { n as usize };
                cc.find_all_into(hay, limit, &mut out);
                return out;
            }
        }
        let mut slots = [None, None];
        let mut pos = 0usize;
        let mut last_nonempty_end: Option<usize> = None;
        let mut count = 0isize;
        while pos <= hay.len() {
            if !self.exec(&mut state, hay, pos, &mut slots) {
                break;
            }
            let (s, e) = (slots[0].unwrap(), slots[1].unwrap());
            if s == e && Some(e) == last_nonempty_end {
                pos = e + 1;
                continue;
            }
            out.push((s, e));
            count += 1;
            if e > s {
                last_nonempty_end = Some(e);
                pos = std::cmp::max(e, pos + 1);
            } else {
                pos = e + 1;
            }
            if n > 0 && count >= n {
                break;
            }
        }
        out
    }

    /// The number of matches, with the same discipline as the streaming
    /// iterator. `n <= 0` means no limit.
    pub fn count(&self, hay: &[u8], n: isize) -> usize {
        let mut state = self.pool.get();
        let mut slots = [None, None];
        let mut pos = 0usize;
        let mut last_nonempty_end: Option<usize> = None;
        let mut count = 0usize;
        while pos <= hay.len() {
            if !self.exec(&mut state, hay, pos, &mut slots) {
                break;
            }
            let (s, e) = (slots[0].unwrap(), slots[1].unwrap());
            if s == e && Some(e) == last_nonempty_end {
                pos = e + 1;
                continue;
            }
            count += 1;
            if e > s {
                last_nonempty_end = Some(e);
                pos = std::cmp::max(e, pos + 1);
            } else {
                pos = e + 1;
            }
            if n > 0 && count >= n as usize {
                break;
            }
        }
        count
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The number of capture groups, including group 0.
    pub fn num_captures(&self) -> usize {
        self.prog.ncaps
    }

    pub fn subexp_names(&self) -> &[Option<String>] {
        &self.cap_names
    }

    pub fn is_start_anchored(&self) -> bool {
        self.prog.anchored_begin
    }

    pub fn is_always_anchored(&self) -> bool {
        self.prog.anchored_begin && self.prog.anchored_end
    }

    /// Switch between leftmost-first (default) and leftmost-longest match
    /// semantics. Takes effect for calls that start after the store.
    pub fn set_longest(&self, yes: bool) {
        self.longest.store(yes, Ordering::Relaxed);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    // ---- dispatch ----

    /// Pick the program to simulate: the ASCII variant wins on all-ASCII
    /// haystacks. For start-anchored patterns only a 4096-byte prefix is
    /// checked; a match cannot reach past what the backtracker budget
    /// admits anyway.
    fn prog_for(&self, hay: &[u8]) -> &Program {
        match self.ascii_prog {
            None => &self.prog,
            Some(ref ascii) => {
                let check = if self.prog.anchored_begin {
                    &hay[..hay.len().min(4096)]
                } else {
                    hay
                };
                if check.is_ascii() {
                    ascii
                } else {
                    &self.prog
                }
            }
        }
    }

    /// Clipped class tables are only sound when no byte can belong to a
    /// multi-byte character, i.e. on all-ASCII haystacks.
    fn class_tables_apply(&self, hay: &[u8]) -> bool {
        let exact = match (&self.charclass, &self.composite) {
            (Some(cc), _) => cc.is_exact(),
            (_, Some(c)) => c.is_exact(),
            _ => true,
        };
        exact || hay.is_ascii()
    }

    /// The core search: fills `slots[0..2]` with the match boundaries.
    /// Empty `slots` asks only for existence.
    fn exec(
        &self,
        state: &mut SearchState,
        hay: &[u8],
        at: usize,
        slots: &mut [Option<usize>],
    ) -> bool {
        if at > hay.len() {
            return false;
        }
        if self.prog.anchored_begin && at > 0 {
            return false;
        }
        if self.longest.load(Ordering::Relaxed) {
            // Longest semantics live in the NFA simulation; every other
            // engine implements leftmost-first only.
            return self.nfa_search(state, hay, at, slots, true);
        }
        match self.strategy {
            Strategy::AnchoredLiteral => {
                let m = self.anchored_lit.as_ref().unwrap().find_at(hay, at);
                store(slots, m)
            }
            Strategy::BranchDispatch => {
                let m = self.branch.as_ref().unwrap().find_at(hay, at);
                store(slots, m)
            }
            Strategy::ReverseAnchored => {
                let rev = self.rev_dfa().unwrap();
                Stats::bump(&self.stats.dfa_searches);
                match reverse::reverse_anchored(&rev, &mut state.rdfa, hay, at) {
                    Attempt::Found(s, e) => store(slots, Some((s, e))),
                    Attempt::NoMatch => false,
                    Attempt::GiveUp => self.dfa_failed(state, hay, at, slots),
                }
            }
            Strategy::ReverseSuffix => {
                let rev = self.rev_dfa().unwrap();
                let fwd = self.fwd_dfa();
                Stats::bump(&self.stats.dfa_searches);
                let attempt = reverse::reverse_suffix(
                    self.suffix_finder.as_ref().unwrap(),
                    self.prefix_kind.as_ref().unwrap(),
                    &rev,
                    &mut state.rdfa,
                    &fwd,
                    &mut state.fdfa,
                    hay,
                    at,
                );
                match attempt {
                    Attempt::Found(s, e) => {
                        Stats::bump(&self.stats.prefilter_hits);
                        store(slots, Some((s, e)))
                    }
                    Attempt::NoMatch => false,
                    Attempt::GiveUp => self.dfa_failed(state, hay, at, slots),
                }
            }
            Strategy::ReverseSuffixSet => {
                let rev = self.rev_dfa().unwrap();
                let fwd = self.fwd_dfa();
                Stats::bump(&self.stats.dfa_searches);
                let attempt = reverse::reverse_suffix_set(
                    self.pre_suffix.as_ref().unwrap(),
                    &rev,
                    &mut state.rdfa,
                    &fwd,
                    &mut state.fdfa,
                    hay,
                    at,
                );
                match attempt {
                    Attempt::Found(s, e) => {
                        Stats::bump(&self.stats.prefilter_hits);
                        store(slots, Some((s, e)))
                    }
                    Attempt::NoMatch => false,
                    Attempt::GiveUp => self.dfa_failed(state, hay, at, slots),
                }
            }
            Strategy::MultilineReverseSuffix => {
                let pre = self.pre_suffix.as_ref().unwrap();
                match reverse::multiline_start(pre, hay, at) {
                    None => false,
                    Some(start) => {
                        Stats::bump(&self.stats.prefilter_hits);
                        self.nfa_search(state, hay, start, slots, false)
                    }
                }
            }
            Strategy::ReverseInner => {
                let suffix_fwd = Dfa::forward(
                    self.inner_suffix_prog.as_ref().unwrap(),
                    self.config.max_dfa_states,
                    self.config.determinize_limit,
                );
                let prefix_rev = self.inner_prefix_prog.as_ref().map(|p| {
                    Dfa::reverse(
                        p,
                        self.config.max_dfa_states,
                        self.config.determinize_limit,
                    )
                });
                Stats::bump(&self.stats.dfa_searches);
                let attempt = reverse::reverse_inner(
                    self.pre_inner.as_ref().unwrap(),
                    self.prefix_kind.as_ref().unwrap(),
                    prefix_rev.as_ref(),
                    &mut state.pdfa,
                    &suffix_fwd,
                    &mut state.sdfa,
                    hay,
                    at,
                );
                match attempt {
                    Attempt::Found(s, e) => {
                        Stats::bump(&self.stats.prefilter_hits);
                        store(slots, Some((s, e)))
                    }
                    Attempt::NoMatch => false,
                    Attempt::GiveUp => self.dfa_failed(state, hay, at, slots),
                }
            }
            Strategy::Teddy | Strategy::AhoCorasick => {
                let pre = self.pre_prefix.as_ref().unwrap();
                if pre.is_aho_corasick() {
                    Stats::bump(&self.stats.aho_corasick_searches);
                }
                if self.complete_prefilter {
                    match pre.find_span(hay, at) {
                        None => false,
                        Some((s, e)) => {
                            Stats::bump(&self.stats.prefilter_hits);
                            store(slots, Some((s, e)))
                        }
                    }
                } else {
                    self.nfa_search_pre(state, hay, at, slots, Some(pre))
                }
            }
            Strategy::DigitPrefilter => self.digit_search(state, hay, at, slots),
            Strategy::CharClassSearcher => {
                if self.class_tables_apply(hay) {
                    let m = self.charclass.as_ref().unwrap().find_at(hay, at);
                    store(slots, m)
                } else {
                    self.nfa_search(state, hay, at, slots, false)
                }
            }
            Strategy::CompositeSearcher => {
                if self.class_tables_apply(hay) {
                    let m = self.composite.as_ref().unwrap().find_at(hay, at);
                    store(slots, m)
                } else {
                    self.nfa_search(state, hay, at, slots, false)
                }
            }
            Strategy::BoundedBacktracker | Strategy::Both => {
                let p = self.prog_for(hay);
                if Backtracker::can_handle(p.insts.len(), hay.len()) {
                    Stats::bump(&self.stats.nfa_searches);
                    return self.backtrack_search(state, p, hay, at, slots);
                }
                // Oversize: bidirectional DFA, then the NFA.
                trace!("backtracker oversize at len {}, using DFA", hay.len());
                match self.dfa_indices(state, hay, at, slots) {
                    Some(found) => found,
                    None => self.nfa_search(state, hay, at, slots, false),
                }
            }
            Strategy::Dfa => match self.dfa_indices(state, hay, at, slots) {
                Some(found) => found,
                None => self.nfa_search(state, hay, at, slots, false),
            },
            Strategy::Nfa => self.nfa_search(state, hay, at, slots, false),
        }
    }

    /// The capture-slot search. The heavy lifting is choosing the cheapest
    /// engine that can fill all slots.
    fn exec_captures(
        &self,
        state: &mut SearchState,
        hay: &[u8],
        at: usize,
        slots: &mut [Option<usize>],
    ) -> bool {
        if at > hay.len() {
            return false;
        }
        if self.prog.anchored_begin && at > 0 {
            return false;
        }
        if self.longest.load(Ordering::Relaxed) {
            return self.nfa_search(state, hay, at, slots, true);
        }
        if at == 0 {
            if let Some(ref op) = self.onepass {
                Stats::bump(&self.stats.onepass_searches);
                return op.exec(&self.prog, slots, hay);
            }
        }
        let p = self.prog_for(hay);
        if Backtracker::can_handle(p.insts.len(), hay.len()) {
            Stats::bump(&self.stats.nfa_searches);
            return self.backtrack_search(state, p, hay, at, slots);
        }
        // Too big for the backtracker: locate the span with the DFAs, then
        // resolve captures on the narrowed input.
        let mut span = [None, None];
        match self.dfa_indices(state, hay, at, &mut span) {
            Some(false) => return false,
            Some(true) => {
                let (s, e) = (span[0].unwrap(), span[1].unwrap());
                if !self.prog.has_end_assert {
                    let narrowed = &hay[..e];
                    let p = self.prog_for(narrowed);
                    Stats::bump(&self.stats.nfa_searches);
                    if Backtracker::can_handle(p.insts.len(), narrowed.len()) {
                        return self.backtrack_search(state, p, narrowed, s, slots);
                    }
                    return Nfa::exec(p, &mut state.nfa, slots, narrowed, s, false, None);
                }
                self.nfa_search(state, hay, s, slots, false)
            }
            None => self.nfa_search(state, hay, at, slots, false),
        }
    }

    fn backtrack_search(
        &self,
        state: &mut SearchState,
        p: &Program,
        hay: &[u8],
        at: usize,
        slots: &mut [Option<usize>],
    ) -> bool {
        Backtracker::search(p, &mut state.back, slots, hay, at)
    }

    fn nfa_search(
        &self,
        state: &mut SearchState,
        hay: &[u8],
        at: usize,
        slots: &mut [Option<usize>],
        longest: bool,
    ) -> bool {
        Stats::bump(&self.stats.nfa_searches);
        let p = self.prog_for(hay);
        Nfa::exec(p, &mut state.nfa, slots, hay, at, longest, None)
    }

    fn nfa_search_pre(
        &self,
        state: &mut SearchState,
        hay: &[u8],
        at: usize,
        slots: &mut [Option<usize>],
        pre: Option<&Prefilter>,
    ) -> bool {
        Stats::bump(&self.stats.nfa_searches);
        let p = self.prog_for(hay);
        Nfa::exec(p, &mut state.nfa, slots, hay, at, false, pre)
    }

    /// Bidirectional DFA: the forward scan finds the match end, the
    /// reverse scan finds the start. `None` means a cache gave out and the
    /// caller must run the NFA.
    fn dfa_indices(
        &self,
        state: &mut SearchState,
        hay: &[u8],
        at: usize,
        slots: &mut [Option<usize>],
    ) -> Option<bool> {
        let rev = self.rev_dfa()?;
        let fwd = self.fwd_dfa();
        Stats::bump(&self.stats.dfa_searches);
        let earliest = slots.is_empty();
        let e = match fwd.find_end(&mut state.fdfa, hay, at, false, earliest) {
            DfaResult::Match(e) => e,
            DfaResult::NoMatch => return Some(false),
            DfaResult::Fail => {
                self.note_cache_full();
                return None;
            }
        };
        if slots.is_empty() {
            return Some(true);
        }
        let s = match rev.find_start(&mut state.rdfa, hay, at, e) {
            DfaResult::Match(s) => s,
            DfaResult::NoMatch => {
                // The forward scan proved a match ends at `e`; the reverse
                // scan must find its start. Treat disagreement as failure.
                self.note_cache_full();
                return None;
            }
            DfaResult::Fail => {
                self.note_cache_full();
                return None;
            }
        };
        store(slots, Some((s, e)));
        Some(true)
    }

    /// Digit prefilter with adaptive abandonment: after too many failed
    /// candidates in a row, this call stops trusting the prefilter and
    /// runs the NFA on the remainder.
    fn digit_search(
        &self,
        state: &mut SearchState,
        hay: &[u8],
        at: usize,
        slots: &mut [Option<usize>],
    ) -> bool {
        let pre = self.pre_prefix.as_ref().unwrap();
        let use_dfa = self.rev_prog.is_some();
        let mut misses = 0u32;
        let mut pos = at;
        loop {
            let (c, _) = match pre.find_span(hay, pos) {
                None => return false,
                Some(span) => span,
            };
            Stats::bump(&self.stats.prefilter_hits);
            // Verify a match starting exactly at the candidate.
            let verified = if use_dfa {
                let fwd = self.fwd_dfa();
                match fwd.find_end(&mut state.fdfa, hay, c, true, false) {
                    DfaResult::Match(e) => Some(Some((c, e))),
                    DfaResult::NoMatch => Some(None),
                    DfaResult::Fail => None,
                }
            } else {
                None
            };
            match verified {
                Some(Some((s, e))) => return store(slots, Some((s, e))),
                Some(None) => {
                    misses += 1;
                    if misses > PREFILTER_ABANDON_LIMIT {
                        Stats::bump(&self.stats.prefilter_abandoned);
                        trace!("digit prefilter abandoned after {} misses", misses);
                        return self.nfa_search(state, hay, pos, slots, false);
                    }
                    pos = c + 1;
                }
                None => {
                    // No DFA (or its cache filled): the NFA both verifies
                    // and finishes the call.
                    return self.nfa_search(state, hay, c, slots, false);
                }
            }
        }
    }

    fn dfa_failed(
        &self,
        state: &mut SearchState,
        hay: &[u8],
        at: usize,
        slots: &mut [Option<usize>],
    ) -> bool {
        self.note_cache_full();
        self.nfa_search(state, hay, at, slots, false)
    }

    fn note_cache_full(&self) {
        Stats::bump(&self.stats.dfa_cache_full);
        trace!("DFA gave up; falling back to NFA");
    }

    fn fwd_dfa(&self) -> Dfa<'_> {
        Dfa::forward(
            &self.prog,
            self.config.max_dfa_states,
            self.config.determinize_limit,
        )
    }

    fn rev_dfa(&self) -> Option<Dfa<'_>> {
        self.rev_prog.as_ref().map(|p| {
            Dfa::reverse(p, self.config.max_dfa_states, self.config.determinize_limit)
        })
    }

}

fn classify_prefix_hir(hir: &Hir) -> PrefixKind {
    use regex_syntax::hir::{Class, HirKind};
    let rep = match *hir.kind() {
        HirKind::Repetition(ref rep)
            if rep.min == 0 && rep.max.is_none() =>
        {
            rep
        }
        _ => return PrefixKind::General,
    };
    let cls = match *rep.sub.kind() {
        HirKind::Class(ref cls) => cls,
        _ => return PrefixKind::General,
    };
    match *cls {
        Class::Unicode(ref cls) => {
            let covers_all = cls.iter().any(|r| {
                r.start() == '\0' && r.end() == '\u{10FFFF}'
            });
            if covers_all {
                return PrefixKind::DotAll;
            }
            let mut table = Box::new([false; 256]);
            for r in cls.iter() {
                if r.end() as u32 > 0x7F {
                    return PrefixKind::General;
                }
                for b in (r.start() as u32)..=(r.end() as u32) {
                    table[b as usize] = true;
                }
            }
            PrefixKind::ClassStar(table)
        }
        Class::Bytes(ref cls) => {
            let mut table = Box::new([false; 256]);
            let mut all = true;
            for b in 0..=255u8 {
                let within = cls.iter().any(|r| r.start() <= b && b <= r.end());
                table[b as usize] = within;
                all = all && within;
            }
            if all {
                PrefixKind::DotAll
            } else {
                PrefixKind::ClassStar(table)
            }
        }
    }
}

fn store(slots: &mut [Option<usize>], m: Option<(usize, usize)>) -> bool {
    match m {
        None => false,
        Some((s, e)) => {
            if slots.len() >= 2 {
                slots[0] = Some(s);
                slots[1] = Some(e);
            }
            true
        }
    }
}

