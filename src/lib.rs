// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A multi-strategy regular expression engine.
//!
//! One call to [`compile`] turns a pattern into several complementary
//! search machines: literal prefilters, a lazy DFA (forward and reverse),
//! a bounded backtracker, a one-pass capture table and the NFA
//! simulation. A strategy chosen at compile time routes each search to the
//! machine expected to do the least work; run-time budgets (DFA cache,
//! backtracker bitmap, anti-quadratic guards) make individual calls fall
//! back to the NFA, never changing the result.
//!
//! ```
//! use meta_regex::compile;
//!
//! let re = compile(r"(\w+)@(\w+)\.(\w+)").unwrap();
//! let caps = re.find_submatch(b"mail user@example.com now").unwrap();
//! assert_eq!(caps.get(0).unwrap().as_bytes(), b"user@example.com");
//! assert_eq!(caps.get(2).unwrap().as_bytes(), b"example");
//! ```
//!
//! Haystacks are byte slices and all positions are byte offsets into
//! them; matches are `[start, end)` half-open ranges. Match semantics are
//! leftmost-first by default, switchable to leftmost-longest with
//! [`Engine::set_longest`].
//!
//! An [`Engine`] is immutable after compilation and freely shareable
//! across threads; per-search scratch state is pooled internally.
//! Searching never fails: compilation is the only fallible operation.

pub use crate::error::Error;
pub use crate::exec::{
    compile, compile_with_config, Captures, Config, Engine, Match,
};
pub use crate::stats::StatsSnapshot;
pub use crate::strategy::Strategy;

mod anchored;
mod backtrack;
mod charclass;
mod compile;
mod dfa;
mod error;
mod exec;
mod inst;
mod literal;
mod nfa;
mod onepass;
mod pool;
mod prefilter;
mod program;
mod reverse;
mod stats;
mod strategy;
