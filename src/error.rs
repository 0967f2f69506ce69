// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::error;
use std::fmt;

/// An error that occurred during compilation of a regular expression.
///
/// Searching never fails. Every budget a search can exhaust at run time
/// (DFA state cache, backtracker bitmap, anti-quadratic guards) degrades to
/// another matching engine instead of surfacing an error.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A syntax error in the pattern, as reported by the parser. The string
    /// is the parser's own rendering, which includes the offending span.
    Syntax(String),
    /// The compiled program exceeded the configured size limit. The limit
    /// (in bytes) is included.
    CompiledTooBig(usize),
    /// A configuration value was out of range.
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Syntax(ref err) => err.fmt(f),
            Error::CompiledTooBig(limit) => {
                write!(f, "regexp: compiled program exceeds size limit of {} bytes", limit)
            }
            Error::Config(ref msg) => write!(f, "regexp: invalid configuration: {}", msg),
        }
    }
}

impl error::Error for Error {}

impl From<regex_syntax::Error> for Error {
    fn from(err: regex_syntax::Error) -> Error {
        Error::Syntax(err.to_string())
    }
}
