// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use regex_syntax::hir::{self, Hir, HirKind, Look};
use utf8_ranges::{Utf8Sequence, Utf8Sequences};

use crate::error::Error;
use crate::inst::{
    EmptyLook, Inst, InstBytes, InstEmptyLook, InstIdx, InstSave, InstSplit,
};
use crate::program::{self, Program};

/// A placeholder for a goto that has not been wired up yet. Every hole is
/// filled before compilation returns.
const HOLE: InstIdx = usize::MAX;

/// A compiler translates a parsed expression into a byte program.
///
/// The same compiler drives four program flavors: forward UTF-8, forward
/// ASCII (classes intersected with ASCII, which shrinks `.` and `\w` to
/// single-byte tests), and the reverse of either. A reverse program matches
/// the reversed language: concatenations, literal bytes and UTF-8 sequences
/// are emitted back to front, and start/end assertions trade places.
#[derive(Debug)]
pub struct Compiler {
    size_limit: usize,
    ascii: bool,
    reverse: bool,
    insts: Vec<Inst>,
    ncaps: usize,
    names: Vec<(usize, String)>,
}

impl Compiler {
    pub fn new(size_limit: usize) -> Compiler {
        Compiler {
            size_limit,
            ascii: false,
            reverse: false,
            insts: vec![],
            ncaps: 1,
            names: vec![],
        }
    }

    /// Restrict all character classes to their ASCII subset.
    pub fn ascii(mut self, yes: bool) -> Compiler {
        self.ascii = yes;
        self
    }

    /// Compile the reversed language. Capture saves are not emitted; the
    /// reverse program exists to locate match boundaries, not submatches.
    pub fn reverse(mut self, yes: bool) -> Compiler {
        self.reverse = yes;
        self
    }

    pub fn compile(mut self, hir: &Hir) -> Result<Program, Error> {
        // The unanchored entry: a lazy `(?s:.)*?` loop that prefers
        // entering the pattern over consuming another byte.
        self.insts.push(Inst::Split(InstSplit { goto1: HOLE, goto2: 1 }));
        self.insts.push(Inst::Bytes(InstBytes { goto: 0, start: 0, end: 255 }));

        let start = self.push(Inst::Save(InstSave { goto: HOLE, slot: 0 }));
        let patch = self.c(hir)?;
        let save1 = self.push(Inst::Save(InstSave { goto: HOLE, slot: 1 }));
        match patch {
            Some(p) => {
                self.fill(Hole::Goto(start), p.entry);
                self.fill_all(p.holes, save1);
            }
            None => self.fill(Hole::Goto(start), save1),
        }
        let mtch = self.push(Inst::Match);
        self.fill(Hole::Goto(save1), mtch);
        self.fill(Hole::Split1(0), start);

        let size = self.insts.len() * std::mem::size_of::<Inst>();
        if size > self.size_limit {
            return Err(Error::CompiledTooBig(self.size_limit));
        }

        let props = hir.properties();
        let begin = props.look_set_prefix().contains(Look::Start);
        let end = props.look_set_suffix().contains(Look::End);
        let (anchored_begin, anchored_end) =
            if self.reverse { (end, begin) } else { (begin, end) };
        let has_word_boundary = self.insts.iter().any(|inst| match *inst {
            Inst::EmptyLook(ref e) => matches!(
                e.look,
                EmptyLook::WordBoundary | EmptyLook::NotWordBoundary
            ),
            _ => false,
        });
        let has_end_assert = has_word_boundary
            || self.insts.iter().any(|inst| match *inst {
                Inst::EmptyLook(ref e) => {
                    matches!(e.look, EmptyLook::EndText | EmptyLook::EndLine)
                }
                _ => false,
            });

        let mut cap_names = vec![None; self.ncaps];
        for (i, name) in self.names.drain(..) {
            cap_names[i] = Some(name);
        }
        let (byte_classes, nclasses) = program::byte_classes(&self.insts);
        Ok(Program {
            insts: self.insts,
            start,
            start_unanchored: 0,
            cap_names,
            ncaps: self.ncaps,
            anchored_begin,
            anchored_end,
            has_word_boundary,
            has_end_assert,
            only_ascii: self.ascii,
            byte_classes,
            nclasses,
        })
    }

    fn c(&mut self, hir: &Hir) -> Result<Option<Patch>, Error> {
        match *hir.kind() {
            HirKind::Empty => Ok(None),
            HirKind::Literal(hir::Literal(ref bytes)) => self.c_literal(bytes),
            HirKind::Class(hir::Class::Unicode(ref cls)) => {
                self.c_class_unicode(cls)
            }
            HirKind::Class(hir::Class::Bytes(ref cls)) => {
                self.c_class_bytes(cls)
            }
            HirKind::Look(ref look) => self.c_look(look),
            HirKind::Repetition(ref rep) => self.c_repetition(rep),
            HirKind::Capture(ref cap) => self.c_capture(cap),
            HirKind::Concat(ref subs) => self.c_concat(subs),
            HirKind::Alternation(ref subs) => self.c_alternation(subs),
        }
    }

    fn c_concat(&mut self, subs: &[Hir]) -> Result<Option<Patch>, Error> {
        let mut entry = None;
        let mut holes = vec![];
        let it: Box<dyn Iterator<Item = &Hir>> = if self.reverse {
            Box::new(subs.iter().rev())
        } else {
            Box::new(subs.iter())
        };
        for sub in it {
            if let Some(p) = self.c(sub)? {
                if entry.is_none() {
                    entry = Some(p.entry);
                } else {
                    self.fill_all(holes, p.entry);
                }
                holes = p.holes;
            }
        }
        Ok(entry.map(|entry| Patch { entry, holes }))
    }

    fn c_alternation(&mut self, subs: &[Hir]) -> Result<Option<Patch>, Error> {
        debug_assert!(subs.len() >= 2);
        let mut entry = None;
        let mut holes = vec![];
        let mut prev_split: Option<InstIdx> = None;
        for (i, sub) in subs.iter().enumerate() {
            let last = i == subs.len() - 1;
            if !last {
                let split =
                    self.push(Inst::Split(InstSplit { goto1: HOLE, goto2: HOLE }));
                match prev_split {
                    Some(ps) => self.fill(Hole::Split2(ps), split),
                    None => entry = Some(split),
                }
                prev_split = Some(split);
                match self.c(sub)? {
                    Some(p) => {
                        self.fill(Hole::Split1(split), p.entry);
                        holes.extend(p.holes);
                    }
                    None => holes.push(Hole::Split1(split)),
                }
            } else {
                let ps = prev_split.unwrap();
                match self.c(sub)? {
                    Some(p) => {
                        self.fill(Hole::Split2(ps), p.entry);
                        holes.extend(p.holes);
                    }
                    None => holes.push(Hole::Split2(ps)),
                }
            }
        }
        Ok(Some(Patch { entry: entry.unwrap(), holes }))
    }

    fn c_literal(&mut self, bytes: &[u8]) -> Result<Option<Patch>, Error> {
        if bytes.is_empty() {
            return Ok(None);
        }
        let mut entry = None;
        let mut prev: Option<Hole> = None;
        let it: Box<dyn Iterator<Item = &u8>> = if self.reverse {
            Box::new(bytes.iter().rev())
        } else {
            Box::new(bytes.iter())
        };
        for &b in it {
            let pc = self.push(Inst::Bytes(InstBytes {
                goto: HOLE,
                start: b,
                end: b,
            }));
            match prev {
                Some(h) => self.fill(h, pc),
                None => entry = Some(pc),
            }
            prev = Some(Hole::Goto(pc));
        }
        Ok(Some(Patch { entry: entry.unwrap(), holes: vec![prev.unwrap()] }))
    }

    fn c_class_unicode(
        &mut self,
        cls: &hir::ClassUnicode,
    ) -> Result<Option<Patch>, Error> {
        if self.ascii {
            let mut ranges = vec![];
            for r in cls.iter() {
                let (s, e) = (r.start() as u32, r.end() as u32);
                if s > 0x7F {
                    continue;
                }
                ranges.push((s as u8, e.min(0x7F) as u8));
            }
            return Ok(Some(self.byte_ranges(&ranges)));
        }
        let mut frags = vec![];
        for r in cls.iter() {
            for seq in Utf8Sequences::new(r.start(), r.end()) {
                frags.push(self.c_utf8_seq(&seq));
            }
        }
        if frags.is_empty() {
            return Ok(Some(self.fail()));
        }
        Ok(Some(self.alt_patches(frags)))
    }

    fn c_class_bytes(
        &mut self,
        cls: &hir::ClassBytes,
    ) -> Result<Option<Patch>, Error> {
        let mut ranges: Vec<(u8, u8)> =
            cls.iter().map(|r| (r.start(), r.end())).collect();
        if self.ascii {
            ranges.retain(|&(s, _)| s <= 0x7F);
            for r in &mut ranges {
                r.1 = r.1.min(0x7F);
            }
        }
        Ok(Some(self.byte_ranges(&ranges)))
    }

    fn c_utf8_seq(&mut self, seq: &Utf8Sequence) -> Patch {
        let mut entry = None;
        let mut prev: Option<Hole> = None;
        let ranges = seq.as_slice();
        let it: Box<dyn Iterator<Item = &utf8_ranges::Utf8Range>> =
            if self.reverse {
                Box::new(ranges.iter().rev())
            } else {
                Box::new(ranges.iter())
            };
        for r in it {
            let pc = self.push(Inst::Bytes(InstBytes {
                goto: HOLE,
                start: r.start,
                end: r.end,
            }));
            match prev {
                Some(h) => self.fill(h, pc),
                None => entry = Some(pc),
            }
            prev = Some(Hole::Goto(pc));
        }
        Patch { entry: entry.unwrap(), holes: vec![prev.unwrap()] }
    }

    /// An alternation of single-byte ranges. An empty set compiles to an
    /// instruction that can never match.
    fn byte_ranges(&mut self, ranges: &[(u8, u8)]) -> Patch {
        if ranges.is_empty() {
            return self.fail();
        }
        let frags: Vec<Patch> = ranges
            .iter()
            .map(|&(s, e)| {
                let pc = self.push(Inst::Bytes(InstBytes {
                    goto: HOLE,
                    start: s,
                    end: e,
                }));
                Patch { entry: pc, holes: vec![Hole::Goto(pc)] }
            })
            .collect();
        self.alt_patches(frags)
    }

    /// Join already-compiled fragments into a split chain, preserving order.
    fn alt_patches(&mut self, mut frags: Vec<Patch>) -> Patch {
        if frags.len() == 1 {
            return frags.pop().unwrap();
        }
        let mut holes = vec![];
        let mut entry = None;
        let mut prev_split: Option<InstIdx> = None;
        let last = frags.pop().unwrap();
        for frag in frags {
            let split =
                self.push(Inst::Split(InstSplit { goto1: frag.entry, goto2: HOLE }));
            match prev_split {
                Some(ps) => self.fill(Hole::Split2(ps), split),
                None => entry = Some(split),
            }
            prev_split = Some(split);
            holes.extend(frag.holes);
        }
        self.fill(Hole::Split2(prev_split.unwrap()), last.entry);
        holes.extend(last.holes);
        Patch { entry: entry.unwrap(), holes }
    }

    /// A byte test that never succeeds.
    fn fail(&mut self) -> Patch {
        let pc =
            self.push(Inst::Bytes(InstBytes { goto: HOLE, start: 1, end: 0 }));
        Patch { entry: pc, holes: vec![Hole::Goto(pc)] }
    }

    fn c_look(&mut self, look: &Look) -> Result<Option<Patch>, Error> {
        let mut el = match *look {
            Look::Start => EmptyLook::StartText,
            Look::End => EmptyLook::EndText,
            Look::StartLF | Look::StartCRLF => EmptyLook::StartLine,
            Look::EndLF | Look::EndCRLF => EmptyLook::EndLine,
            Look::WordAscii | Look::WordUnicode => EmptyLook::WordBoundary,
            Look::WordAsciiNegate | Look::WordUnicodeNegate => {
                EmptyLook::NotWordBoundary
            }
            _ => {
                return Err(Error::Syntax(format!(
                    "unsupported zero-width assertion: {:?}",
                    look
                )))
            }
        };
        if self.reverse {
            el = match el {
                EmptyLook::StartText => EmptyLook::EndText,
                EmptyLook::EndText => EmptyLook::StartText,
                EmptyLook::StartLine => EmptyLook::EndLine,
                EmptyLook::EndLine => EmptyLook::StartLine,
                other => other,
            };
        }
        let pc = self.push(Inst::EmptyLook(InstEmptyLook { goto: HOLE, look: el }));
        Ok(Some(Patch { entry: pc, holes: vec![Hole::Goto(pc)] }))
    }

    fn c_capture(&mut self, cap: &hir::Capture) -> Result<Option<Patch>, Error> {
        let idx = cap.index as usize;
        self.ncaps = self.ncaps.max(idx + 1);
        if let Some(ref name) = cap.name {
            self.names.push((idx, name.to_string()));
        }
        if self.reverse {
            // The reverse program only locates boundaries; submatch slots
            // are resolved by a forward engine afterwards.
            return self.c(&cap.sub);
        }
        let open = self.push(Inst::Save(InstSave { goto: HOLE, slot: 2 * idx }));
        let close_goto = match self.c(&cap.sub)? {
            Some(p) => {
                self.fill(Hole::Goto(open), p.entry);
                p.holes
            }
            None => vec![Hole::Goto(open)],
        };
        let close =
            self.push(Inst::Save(InstSave { goto: HOLE, slot: 2 * idx + 1 }));
        self.fill_all(close_goto, close);
        Ok(Some(Patch { entry: open, holes: vec![Hole::Goto(close)] }))
    }

    fn c_repetition(
        &mut self,
        rep: &hir::Repetition,
    ) -> Result<Option<Patch>, Error> {
        let (min, max) = (rep.min as usize, rep.max.map(|m| m as usize));
        match (min, max) {
            (0, Some(0)) => Ok(None),
            (0, None) => self.c_star(&rep.sub, rep.greedy),
            (1, None) => self.c_plus(&rep.sub, rep.greedy),
            (min, None) => {
                // x{m,} == x^(m-1) x+
                let mut entry = None;
                let mut holes = vec![];
                for _ in 0..min - 1 {
                    if let Some(p) = self.c(&rep.sub)? {
                        match entry {
                            None => entry = Some(p.entry),
                            Some(_) => self.fill_all(holes, p.entry),
                        }
                        holes = p.holes;
                    }
                }
                match self.c_plus(&rep.sub, rep.greedy)? {
                    Some(p) => {
                        match entry {
                            None => entry = Some(p.entry),
                            Some(_) => self.fill_all(holes, p.entry),
                        }
                        holes = p.holes;
                    }
                    None => return Ok(entry.map(|entry| Patch { entry, holes })),
                }
                Ok(entry.map(|entry| Patch { entry, holes }))
            }
            (min, Some(max)) => {
                // x{m,n} == x^m (x (x (...)?)?)? with n-m optional layers.
                let mut entry = None;
                let mut holes = vec![];
                let mut out_holes = vec![];
                for _ in 0..min {
                    if let Some(p) = self.c(&rep.sub)? {
                        match entry {
                            None => entry = Some(p.entry),
                            Some(_) => self.fill_all(holes, p.entry),
                        }
                        holes = p.holes;
                    }
                }
                for _ in min..max {
                    let split = self
                        .push(Inst::Split(InstSplit { goto1: HOLE, goto2: HOLE }));
                    match entry {
                        None => entry = Some(split),
                        Some(_) => {
                            let prev = std::mem::take(&mut holes);
                            self.fill_all(prev, split);
                        }
                    }
                    let (into, out) = if rep.greedy {
                        (Hole::Split1(split), Hole::Split2(split))
                    } else {
                        (Hole::Split2(split), Hole::Split1(split))
                    };
                    out_holes.push(out);
                    match self.c(&rep.sub)? {
                        Some(p) => {
                            self.fill(into, p.entry);
                            holes = p.holes;
                        }
                        None => holes = vec![into],
                    }
                }
                holes.extend(out_holes);
                Ok(entry.map(|entry| Patch { entry, holes }))
            }
        }
    }

    fn c_star(&mut self, sub: &Hir, greedy: bool) -> Result<Option<Patch>, Error> {
        let split = self.push(Inst::Split(InstSplit { goto1: HOLE, goto2: HOLE }));
        match self.c(sub)? {
            Some(p) => {
                let (into, out) = if greedy {
                    (Hole::Split1(split), Hole::Split2(split))
                } else {
                    (Hole::Split2(split), Hole::Split1(split))
                };
                self.fill(into, p.entry);
                self.fill_all(p.holes, split);
                Ok(Some(Patch { entry: split, holes: vec![out] }))
            }
            None => Ok(Some(Patch {
                entry: split,
                holes: vec![Hole::Split1(split), Hole::Split2(split)],
            })),
        }
    }

    fn c_plus(&mut self, sub: &Hir, greedy: bool) -> Result<Option<Patch>, Error> {
        match self.c(sub)? {
            None => Ok(None),
            Some(p) => {
                let split =
                    self.push(Inst::Split(InstSplit { goto1: HOLE, goto2: HOLE }));
                self.fill_all(p.holes, split);
                let (back, out) = if greedy {
                    (Hole::Split1(split), Hole::Split2(split))
                } else {
                    (Hole::Split2(split), Hole::Split1(split))
                };
                self.fill(back, p.entry);
                Ok(Some(Patch { entry: p.entry, holes: vec![out] }))
            }
        }
    }

    fn push(&mut self, inst: Inst) -> InstIdx {
        self.insts.push(inst);
        self.insts.len() - 1
    }

    fn fill(&mut self, hole: Hole, pc: InstIdx) {
        match hole {
            Hole::Goto(i) => match self.insts[i] {
                Inst::Save(ref mut s) => s.goto = pc,
                Inst::EmptyLook(ref mut e) => e.goto = pc,
                Inst::Bytes(ref mut b) => b.goto = pc,
                _ => unreachable!("goto hole on branchless instruction"),
            },
            Hole::Split1(i) => match self.insts[i] {
                Inst::Split(ref mut s) => s.goto1 = pc,
                _ => unreachable!("split hole on non-split instruction"),
            },
            Hole::Split2(i) => match self.insts[i] {
                Inst::Split(ref mut s) => s.goto2 = pc,
                _ => unreachable!("split hole on non-split instruction"),
            },
        }
    }

    fn fill_all(&mut self, holes: Vec<Hole>, pc: InstIdx) {
        for hole in holes {
            self.fill(hole, pc);
        }
    }
}

#[derive(Debug)]
struct Patch {
    entry: InstIdx,
    holes: Vec<Hole>,
}

#[derive(Clone, Copy, Debug)]
enum Hole {
    Goto(InstIdx),
    Split1(InstIdx),
    Split2(InstIdx),
}

#[cfg(test)]
mod tests {
    use regex_syntax::ParserBuilder;

    use super::Compiler;
    use crate::inst::Inst;
    use crate::program::Program;

    fn prog(pattern: &str) -> Program {
        let hir = ParserBuilder::new().build().parse(pattern).unwrap();
        Compiler::new(1 << 20).compile(&hir).unwrap()
    }

    fn rev_prog(pattern: &str) -> Program {
        let hir = ParserBuilder::new().build().parse(pattern).unwrap();
        Compiler::new(1 << 20).reverse(true).compile(&hir).unwrap()
    }

    #[test]
    fn anchors() {
        assert!(prog("^a").anchored_begin);
        assert!(!prog("^a").anchored_end);
        assert!(prog("a$").anchored_end);
        assert!(prog(r"\Aa\z").anchored_begin && prog(r"\Aa\z").anchored_end);
        // Reversal swaps the flags.
        assert!(rev_prog("^a").anchored_end);
        assert!(rev_prog("a$").anchored_begin);
    }

    #[test]
    fn captures_counted() {
        let p = prog(r"(a)(?P<x>b)(?:c)");
        assert_eq!(p.ncaps, 3);
        assert_eq!(p.cap_names, vec![None, None, Some("x".to_string())]);
    }

    #[test]
    fn word_boundary_flagged() {
        assert!(prog(r"\bfoo").has_word_boundary);
        assert!(!prog("foo").has_word_boundary);
    }

    #[test]
    fn literal_bytes_reversed() {
        let fwd = prog("abc");
        let rev = rev_prog("abc");
        let fwd_bytes: Vec<u8> = fwd
            .insts
            .iter()
            .filter_map(|i| match *i {
                Inst::Bytes(ref b) if b.start == b.end && b.start.is_ascii_lowercase() => {
                    Some(b.start)
                }
                _ => None,
            })
            .collect();
        let rev_bytes: Vec<u8> = rev
            .insts
            .iter()
            .filter_map(|i| match *i {
                Inst::Bytes(ref b) if b.start == b.end && b.start.is_ascii_lowercase() => {
                    Some(b.start)
                }
                _ => None,
            })
            .collect();
        assert_eq!(fwd_bytes, b"abc".to_vec());
        assert_eq!(rev_bytes, b"cba".to_vec());
    }

    #[test]
    fn ascii_mode_shrinks_dot() {
        let uni = prog(".");
        let asc = {
            let hir = regex_syntax::ParserBuilder::new()
                .build()
                .parse(".")
                .unwrap();
            Compiler::new(1 << 20).ascii(true).compile(&hir).unwrap()
        };
        assert!(asc.insts.len() < uni.insts.len());
        assert!(asc.only_ascii);
    }
}
