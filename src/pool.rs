// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// A simple thread-safe pool of reusable scratch values.
///
/// Acquisition pops a cached value or creates a fresh one; the guard puts
/// the value back when dropped, which covers every exit path including
/// unwinding. Values keep their allocated capacity between uses; it is the
/// caller's job to reset any stale positions before reuse.
pub struct Pool<T> {
    stack: Mutex<Vec<Box<T>>>,
    create: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> Pool<T> {
    pub fn new(create: Box<dyn Fn() -> T + Send + Sync>) -> Pool<T> {
        Pool { stack: Mutex::new(vec![]), create }
    }

    pub fn get(&self) -> PoolGuard<'_, T> {
        let popped = self.stack.lock().unwrap().pop();
        let value = popped.unwrap_or_else(|| Box::new((self.create)()));
        PoolGuard { pool: self, value: Some(value) }
    }

    fn put(&self, value: Box<T>) {
        self.stack.lock().unwrap().push(value);
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Pool").finish()
    }
}

/// A handle to a pooled value. Returns the value to the pool on drop.
pub struct PoolGuard<'a, T> {
    pool: &'a Pool<T>,
    value: Option<Box<T>>,
}

impl<'a, T> Deref for PoolGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value.as_deref().unwrap()
    }
}

impl<'a, T> DerefMut for PoolGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_deref_mut().unwrap()
    }
}

impl<'a, T> Drop for PoolGuard<'a, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.put(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Pool;

    #[test]
    fn reuses_values() {
        let pool: Pool<Vec<u32>> = Pool::new(Box::new(Vec::new));
        {
            let mut v = pool.get();
            v.push(42);
        }
        let v = pool.get();
        // Capacity survives a round trip; contents are the caller's problem.
        assert_eq!(*v, vec![42]);
    }
}
