// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// A one-pass execution table for anchored programs. When, from the anchored
// start, every reachable set of NFA threads has at most one thread able to
// consume any given byte, submatch extraction needs no thread lists and no
// backtracking: a single table walk writes capture slots as it goes.
//
// Construction is conservative. Any ambiguity, any assertion the table
// cannot resolve statically (everything except a leading `\A` and an
// end-of-text `\z`/`$`), or a blown state budget makes the build fail, and
// the engine simply keeps using the general engines for submatches.

use std::collections::HashMap;

use crate::inst::{EmptyLook, Inst, InstIdx};
use crate::program::Program;

const DEAD: u32 = u32::MAX;
const MAX_STATES: usize = 512;

/// One thread of a one-pass state: an instruction the closure stopped at,
/// plus the capture slots its epsilon path wrote on the way.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct OpThread {
    pc: InstIdx,
    writes: Vec<u32>,
}

#[derive(Clone, Debug)]
struct OpTran {
    next: u32,
    writes: Box<[u32]>,
}

#[derive(Clone, Debug)]
struct OpState {
    /// One transition per byte class; `next == DEAD` means no thread
    /// consumes a byte of that class.
    trans: Box<[OpTran]>,
    /// Slot writes for a match at this boundary, if one exists.
    matched: Option<Box<[u32]>>,
    /// Slot writes for a match at end of input (covers both a direct match
    /// and one guarded by an end-of-text assertion).
    eoi: Option<Box<[u32]>>,
}

/// A compiled one-pass table for `find_submatch_at(hay, 0)`.
#[derive(Clone, Debug)]
pub struct OnePass {
    states: Vec<OpState>,
}

impl OnePass {
    /// Attempt to build a one-pass table. Returns `None` when the program
    /// is not one-pass (or not provably so).
    pub fn build(prog: &Program) -> Option<OnePass> {
        if !prog.anchored_begin {
            return None;
        }
        let mut builder = Builder {
            prog,
            states: vec![],
            map: HashMap::new(),
            work: vec![],
        };
        let start = builder.closure(prog.start, true)?;
        builder.intern(start)?;
        while let Some(sid) = builder.next_unbuilt() {
            builder.build_state(sid)?;
        }
        Some(OnePass { states: builder.into_states() })
    }

    /// Run the table over `hay` from position 0, writing capture slots.
    /// Returns true on a match, with `slots` holding the leftmost-first
    /// submatch boundaries.
    pub fn exec(
        &self,
        prog: &Program,
        slots: &mut [Option<usize>],
        hay: &[u8],
    ) -> bool {
        for slot in slots.iter_mut() {
            *slot = None;
        }
        let mut live: Vec<Option<usize>> = vec![None; slots.len()];
        let mut matched = false;
        let mut sid = 0usize;
        for at in 0..hay.len() {
            let state = &self.states[sid];
            if let Some(ref writes) = state.matched {
                copy_match(slots, &live, writes, at);
                matched = true;
            }
            let class = prog.byte_classes[hay[at] as usize] as usize;
            let tran = &state.trans[class];
            if tran.next == DEAD {
                return matched;
            }
            for &slot in tran.writes.iter() {
                if (slot as usize) < live.len() {
                    live[slot as usize] = Some(at);
                }
            }
            sid = tran.next as usize;
        }
        let state = &self.states[sid];
        if let Some(ref writes) = state.eoi {
            copy_match(slots, &live, writes, hay.len());
            matched = true;
        }
        matched
    }
}

fn copy_match(
    slots: &mut [Option<usize>],
    live: &[Option<usize>],
    writes: &[u32],
    at: usize,
) {
    slots.copy_from_slice(live);
    for &slot in writes {
        if (slot as usize) < slots.len() {
            slots[slot as usize] = Some(at);
        }
    }
}

struct Builder<'r> {
    prog: &'r Program,
    states: Vec<Option<OpState>>,
    map: HashMap<Vec<OpThread>, u32>,
    work: Vec<Vec<OpThread>>,
}

impl<'r> Builder<'r> {
    /// Epsilon closure from `pc`, collecting stopped threads in priority
    /// order. Under leftmost-first, threads below a match thread are
    /// discarded. Returns `None` when an unresolvable assertion shows up.
    fn closure(&self, pc: InstIdx, at_start: bool) -> Option<Vec<OpThread>> {
        let mut out: Vec<OpThread> = vec![];
        let mut seen = vec![false; self.prog.insts.len()];
        let mut stack = vec![(pc, Vec::new())];
        while let Some((pc, writes)) = stack.pop() {
            if seen[pc] {
                continue;
            }
            seen[pc] = true;
            match self.prog.insts[pc] {
                Inst::Match => {
                    out.push(OpThread { pc, writes });
                    // Leftmost-first: nothing after a match can win.
                    break;
                }
                Inst::Bytes(_) => out.push(OpThread { pc, writes }),
                Inst::Save(ref inst) => {
                    let mut w = writes;
                    w.push(inst.slot as u32);
                    stack.push((inst.goto, w));
                }
                Inst::Split(ref inst) => {
                    stack.push((inst.goto2, writes.clone()));
                    stack.push((inst.goto1, writes));
                }
                Inst::EmptyLook(ref inst) => match inst.look {
                    EmptyLook::StartText if at_start => {
                        stack.push((inst.goto, writes));
                    }
                    EmptyLook::EndText | EmptyLook::EndLine => {
                        // Pending until end of input.
                        out.push(OpThread { pc, writes });
                    }
                    _ => return None,
                },
            }
        }
        Some(out)
    }

    fn intern(&mut self, threads: Vec<OpThread>) -> Option<u32> {
        if let Some(&sid) = self.map.get(&threads) {
            return Some(sid);
        }
        if self.states.len() >= MAX_STATES {
            return None;
        }
        let sid = self.states.len() as u32;
        self.states.push(None);
        self.work.push(threads.clone());
        self.map.insert(threads, sid);
        Some(sid)
    }

    fn next_unbuilt(&self) -> Option<u32> {
        self.states
            .iter()
            .position(|s| s.is_none())
            .map(|i| i as u32)
    }

    fn build_state(&mut self, sid: u32) -> Option<()> {
        let threads = self.work[sid as usize].clone();
        let nclasses = self.prog.nclasses;

        let mut matched = None;
        let mut eoi = None;
        for t in &threads {
            match self.prog.insts[t.pc] {
                Inst::Match => {
                    if matched.is_none() {
                        matched = Some(t.writes.clone().into_boxed_slice());
                    }
                    if eoi.is_none() {
                        eoi = Some(t.writes.clone().into_boxed_slice());
                    }
                }
                Inst::EmptyLook(ref inst) => {
                    if eoi.is_none() {
                        if let Some(w) = self.eoi_closure(inst.goto, &t.writes)
                        {
                            eoi = Some(w.into_boxed_slice());
                        }
                    }
                }
                _ => {}
            }
        }

        let mut trans = Vec::with_capacity(nclasses);
        for class in 0..nclasses {
            let rep = representative(&self.prog.byte_classes, class as u8)?;
            let mut hit: Option<&OpThread> = None;
            for t in &threads {
                if let Inst::Bytes(ref inst) = self.prog.insts[t.pc] {
                    if inst.matches(rep) {
                        if hit.is_some() {
                            // Two threads can consume the same byte: the
                            // program is not one-pass.
                            return None;
                        }
                        hit = Some(t);
                    }
                }
            }
            match hit {
                None => trans.push(OpTran { next: DEAD, writes: Box::new([]) }),
                Some(t) => {
                    let goto = match self.prog.insts[t.pc] {
                        Inst::Bytes(ref inst) => inst.goto,
                        _ => unreachable!(),
                    };
                    let next_threads = self.closure(goto, false)?;
                    let next = self.intern(dedup(next_threads))?;
                    trans.push(OpTran {
                        next,
                        writes: t.writes.clone().into_boxed_slice(),
                    });
                }
            }
        }

        self.states[sid as usize] =
            Some(OpState { trans: trans.into_boxed_slice(), matched, eoi });
        Some(())
    }

    /// Resolve an end-of-text pending thread at end of input: follow its
    /// continuation with byte instructions dead. Returns the combined slot
    /// writes if it reaches a match.
    fn eoi_closure(&self, pc: InstIdx, writes: &[u32]) -> Option<Vec<u32>> {
        let mut seen = vec![false; self.prog.insts.len()];
        let mut stack = vec![(pc, writes.to_vec())];
        while let Some((pc, writes)) = stack.pop() {
            if seen[pc] {
                continue;
            }
            seen[pc] = true;
            match self.prog.insts[pc] {
                Inst::Match => return Some(writes),
                Inst::Bytes(_) => {}
                Inst::Save(ref inst) => {
                    let mut w = writes;
                    w.push(inst.slot as u32);
                    stack.push((inst.goto, w));
                }
                Inst::Split(ref inst) => {
                    stack.push((inst.goto2, writes.clone()));
                    stack.push((inst.goto1, writes));
                }
                Inst::EmptyLook(ref inst) => match inst.look {
                    EmptyLook::EndText | EmptyLook::EndLine => {
                        stack.push((inst.goto, writes));
                    }
                    _ => {}
                },
            }
        }
        None
    }

    fn into_states(self) -> Vec<OpState> {
        self.states.into_iter().map(|s| s.unwrap()).collect()
    }
}

/// First thread per pc wins, mirroring the NFA simulation's thread dedup.
fn dedup(threads: Vec<OpThread>) -> Vec<OpThread> {
    let mut seen = std::collections::HashSet::new();
    threads.into_iter().filter(|t| seen.insert(t.pc)).collect()
}

/// Any byte belonging to the given class.
fn representative(classes: &[u8], class: u8) -> Option<u8> {
    (0u16..256).map(|b| b as u8).find(|&b| classes[b as usize] == class)
}

#[cfg(test)]
mod tests {
    use regex_syntax::ParserBuilder;

    use super::OnePass;
    use crate::compile::Compiler;
    use crate::program::Program;

    fn prog(pattern: &str) -> Program {
        let hir = ParserBuilder::new().build().parse(pattern).unwrap();
        Compiler::new(1 << 20).compile(&hir).unwrap()
    }

    #[test]
    fn builds_for_anchored_captures() {
        let p = prog(r"^([0-9]+)-([0-9]+)$");
        let op = OnePass::build(&p).expect("one-pass");
        let mut slots = vec![None; 6];
        assert!(op.exec(&p, &mut slots, b"12-345"));
        assert_eq!(slots, vec![Some(0), Some(6), Some(0), Some(2), Some(3), Some(6)]);
        assert!(!op.exec(&p, &mut slots, b"12-"));
    }

    #[test]
    fn unanchored_is_rejected() {
        assert!(OnePass::build(&prog(r"(\d+)")).is_none());
    }

    #[test]
    fn ambiguity_is_rejected() {
        assert!(OnePass::build(&prog(r"^a*a")).is_none());
    }

    #[test]
    fn greedy_repetition_matches_last() {
        let p = prog(r"^([a-z]+)");
        let op = OnePass::build(&p).expect("one-pass");
        let mut slots = vec![None; 4];
        assert!(op.exec(&p, &mut slots, b"abc9"));
        assert_eq!(slots, vec![Some(0), Some(3), Some(0), Some(3)]);
    }
}
