// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// A start-anchored pure literal: `^foo` or `^foo$`. One byte comparison,
/// no automaton.
#[derive(Clone, Debug)]
pub struct AnchoredLiteral {
    lit: Vec<u8>,
    end_anchored: bool,
}

impl AnchoredLiteral {
    pub fn new(lit: Vec<u8>, end_anchored: bool) -> AnchoredLiteral {
        AnchoredLiteral { lit, end_anchored }
    }

    pub fn find_at(&self, hay: &[u8], at: usize) -> Option<(usize, usize)> {
        if at > 0 {
            return None;
        }
        if !hay.starts_with(&self.lit) {
            return None;
        }
        if self.end_anchored && hay.len() != self.lit.len() {
            return None;
        }
        Some((0, self.lit.len()))
    }
}

/// A start-anchored alternation of literals: `^(GET|PUT|POST)…`. The first
/// haystack byte indexes a table of candidate branches, in pattern order,
/// so most calls compare against at most one branch.
#[derive(Clone, Debug)]
pub struct BranchDispatch {
    branches: Vec<Vec<u8>>,
    by_byte: Vec<Vec<u16>>,
    end_anchored: bool,
}

impl BranchDispatch {
    pub fn new(branches: Vec<Vec<u8>>, end_anchored: bool) -> BranchDispatch {
        debug_assert!(branches.iter().all(|b| !b.is_empty()));
        let mut by_byte = vec![vec![]; 256];
        for (i, branch) in branches.iter().enumerate() {
            by_byte[branch[0] as usize].push(i as u16);
        }
        BranchDispatch { branches, by_byte, end_anchored }
    }

    pub fn find_at(&self, hay: &[u8], at: usize) -> Option<(usize, usize)> {
        if at > 0 {
            return None;
        }
        let first = *hay.first()?;
        for &bi in &self.by_byte[first as usize] {
            let branch = &self.branches[bi as usize];
            if hay.starts_with(branch) {
                if self.end_anchored && hay.len() != branch.len() {
                    continue;
                }
                return Some((0, branch.len()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{AnchoredLiteral, BranchDispatch};

    #[test]
    fn anchored_literal() {
        let s = AnchoredLiteral::new(b"foo".to_vec(), false);
        assert_eq!(s.find_at(b"foobar", 0), Some((0, 3)));
        assert_eq!(s.find_at(b"xfoo", 0), None);
        assert_eq!(s.find_at(b"foobar", 1), None);

        let s = AnchoredLiteral::new(b"foo".to_vec(), true);
        assert_eq!(s.find_at(b"foo", 0), Some((0, 3)));
        assert_eq!(s.find_at(b"foobar", 0), None);
    }

    #[test]
    fn branch_dispatch_prefers_pattern_order() {
        let s = BranchDispatch::new(
            vec![b"GET".to_vec(), b"G".to_vec(), b"PUT".to_vec()],
            false,
        );
        assert_eq!(s.find_at(b"GETx", 0), Some((0, 3)));
        assert_eq!(s.find_at(b"GX", 0), Some((0, 1)));
        assert_eq!(s.find_at(b"PUT /", 0), Some((0, 3)));
        assert_eq!(s.find_at(b"HEAD", 0), None);
    }
}
