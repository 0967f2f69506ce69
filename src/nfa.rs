// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// The NFA simulation. It is the engine of last resort: it handles every
// program on every input with worst case O(mn) time, so every run-time
// budget in the other engines can fall back to it. The price is tracking
// one capture-slot copy per live thread.

use crate::prefilter::Prefilter;
use crate::program::{next_char, previous_char, Program};

/// An NFA simulation matching engine.
#[derive(Debug)]
pub struct Nfa<'r, 'h> {
    prog: &'r Program,
    hay: &'h [u8],
    longest: bool,
}

impl<'r, 'h> Nfa<'r, 'h> {
    /// Execute the NFA matching engine.
    ///
    /// If there's a match, `exec` returns `true` and populates the given
    /// slots accordingly. Passing an empty `slots` asks only whether a
    /// match exists, which lets the simulation quit at the first match
    /// state. With `longest` set, the simulation implements
    /// leftmost-longest instead of leftmost-first semantics.
    ///
    /// `pre` is an optional prefix prefilter used to skip ahead whenever
    /// the set of live threads drains.
    pub fn exec(
        prog: &'r Program,
        cache: &mut NfaThreads,
        slots: &mut [Option<usize>],
        hay: &'h [u8],
        start: usize,
        longest: bool,
        pre: Option<&Prefilter>,
    ) -> bool {
        cache.resize(prog.insts.len(), slots.len());
        for slot in slots.iter_mut() {
            *slot = None;
        }
        Nfa { prog, hay, longest }.exec_(cache, slots, start, pre)
    }

    fn exec_(
        &mut self,
        q: &mut NfaThreads,
        slots: &mut [Option<usize>],
        start: usize,
        pre: Option<&Prefilter>,
    ) -> bool {
        let mut matched = false;
        let mut at = start;
        q.clist.clear();
        q.nlist.clear();
        'LOOP: loop {
            if q.clist.size == 0 {
                // Three ways to bail out when our current set of threads is
                // empty.
                //
                // 1. We have a match---so we're done exploring any possible
                //    alternatives. Time to quit.
                //
                // 2. If the expression starts with a '^' we can terminate as
                //    soon as the last thread dies.
                if matched || (at != 0 && self.prog.anchored_begin) {
                    break;
                }

                // 3. If there's a literal prefix for the program, try to
                //    jump ahead quickly. If it can't be found, then we can
                //    bail out early.
                if let Some(pre) = pre {
                    at = match pre.find(self.hay, at) {
                        None => break,
                        Some(i) => i,
                    };
                }
            }

            // This simulates a preceding '.*?' for every regex by adding
            // a thread starting at the current position in the input for
            // the beginning of the program, unless we already have a match
            // (any thread seeded now would start later and thus lose).
            if q.clist.size == 0 || (!self.prog.anchored_begin && !matched) {
                self.add(&mut q.clist, slots, self.prog.start, at);
            }

            let byte = self.hay.get(at).copied();
            for i in 0..q.clist.size {
                let pc = q.clist.pc(i);
                let NfaThreads { ref mut clist, ref mut nlist } = *q;
                if self.step(nlist, slots, clist.caps(i), pc, at, byte) {
                    matched = true;
                    if slots.is_empty() {
                        // If we only care whether a match occurs (not its
                        // position), then we can quit right now.
                        break 'LOOP;
                    }
                    if !self.longest {
                        // We don't need to check the rest of the threads
                        // in this set because we've matched something
                        // ("leftmost-first"). However, we still need to
                        // check threads in the next set to support things
                        // like greedy matching.
                        break;
                    }
                }
            }
            if at >= self.hay.len() {
                break;
            }
            at += 1;
            q.swap();
            q.nlist.clear();
        }
        matched
    }

    fn step(
        &self,
        nlist: &mut Threads,
        slots: &mut [Option<usize>],
        thread_caps: &mut [Option<usize>],
        pc: usize,
        at: usize,
        byte: Option<u8>,
    ) -> bool {
        use crate::inst::Inst::*;
        match self.prog.insts[pc] {
            Match => {
                if self.longest && !slots.is_empty() {
                    // Leftmost-longest: keep the smallest start; among
                    // equal starts, the largest end.
                    let (cs, ce) = (thread_caps[0], thread_caps[1]);
                    let better = match (slots[0], slots[1]) {
                        (None, _) | (_, None) => true,
                        (Some(bs), Some(be)) => match (cs, ce) {
                            (Some(cs), Some(ce)) => {
                                cs < bs || (cs == bs && ce > be)
                            }
                            _ => false,
                        },
                    };
                    if better {
                        for (slot, val) in
                            slots.iter_mut().zip(thread_caps.iter())
                        {
                            *slot = *val;
                        }
                    }
                } else {
                    for (slot, val) in slots.iter_mut().zip(thread_caps.iter())
                    {
                        *slot = *val;
                    }
                }
                true
            }
            Bytes(ref inst) => {
                if let Some(b) = byte {
                    if inst.matches(b) {
                        self.add(nlist, thread_caps, inst.goto, at + 1);
                    }
                }
                false
            }
            EmptyLook(_) | Save(_) | Split(_) => false,
        }
    }

    fn add(
        &self,
        nlist: &mut Threads,
        thread_caps: &mut [Option<usize>],
        pc: usize,
        at: usize,
    ) {
        use crate::inst::Inst::*;

        if nlist.contains(pc) {
            return;
        }
        let ti = nlist.add(pc);
        match self.prog.insts[pc] {
            EmptyLook(ref inst) => {
                let prev = previous_char(self.hay, at);
                let next = next_char(self.hay, at);
                if inst.is_satisfied(prev, next) {
                    self.add(nlist, thread_caps, inst.goto, at);
                }
            }
            Save(ref inst) => {
                if inst.slot >= thread_caps.len() {
                    self.add(nlist, thread_caps, inst.goto, at);
                } else {
                    let old = thread_caps[inst.slot];
                    thread_caps[inst.slot] = Some(at);
                    self.add(nlist, thread_caps, inst.goto, at);
                    thread_caps[inst.slot] = old;
                }
            }
            Split(ref inst) => {
                self.add(nlist, thread_caps, inst.goto1, at);
                self.add(nlist, thread_caps, inst.goto2, at);
            }
            Match | Bytes(_) => {
                let t = nlist.thread(ti);
                for (slot, val) in t.caps.iter_mut().zip(thread_caps.iter()) {
                    *slot = *val;
                }
            }
        }
    }
}

/// Cached thread lists reused across calls in the same search state.
#[derive(Clone, Debug)]
pub struct NfaThreads {
    clist: Threads,
    nlist: Threads,
}

#[derive(Clone, Debug)]
struct Threads {
    dense: Vec<Thread>,
    sparse: Vec<usize>,
    size: usize,
}

#[derive(Clone, Debug)]
struct Thread {
    pc: usize,
    caps: Vec<Option<usize>>,
}

impl NfaThreads {
    pub fn new() -> NfaThreads {
        NfaThreads { clist: Threads::new(), nlist: Threads::new() }
    }

    fn resize(&mut self, num_insts: usize, nslots: usize) {
        self.clist.resize(num_insts, nslots);
        self.nlist.resize(num_insts, nslots);
    }

    fn swap(&mut self) {
        std::mem::swap(&mut self.clist, &mut self.nlist);
    }
}

impl Threads {
    fn new() -> Threads {
        Threads { dense: vec![], sparse: vec![], size: 0 }
    }

    fn resize(&mut self, num_insts: usize, nslots: usize) {
        let old_slots = self.dense.first().map_or(0, |t| t.caps.len());
        if num_insts != self.dense.len() || old_slots != nslots {
            let t = Thread { pc: 0, caps: vec![None; nslots] };
            *self = Threads {
                dense: vec![t; num_insts],
                sparse: vec![0; num_insts],
                size: 0,
            }
        }
    }

    fn add(&mut self, pc: usize) -> usize {
        let i = self.size;
        self.dense[i].pc = pc;
        self.sparse[pc] = i;
        self.size += 1;
        i
    }

    fn thread(&mut self, i: usize) -> &mut Thread {
        &mut self.dense[i]
    }

    fn contains(&self, pc: usize) -> bool {
        let s = self.sparse[pc];
        s < self.size && self.dense[s].pc == pc
    }

    fn clear(&mut self) {
        self.size = 0;
    }

    fn pc(&self, i: usize) -> usize {
        self.dense[i].pc
    }

    fn caps(&mut self, i: usize) -> &mut [Option<usize>] {
        &mut self.dense[i].caps
    }
}
