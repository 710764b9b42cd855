// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Deref;

pub(crate) mod collect_variants;
pub mod genomics;

pub(crate) use collect_variants::collect_variants;

#[derive(CopyGetters, Debug)]
pub(crate) struct SimpleCounter<T>
where
    T: Eq + Hash,
{
    inner: HashMap<T, usize>,
    #[getset(get_copy = "pub(crate)")]
    total_count: usize,
}

impl<T> SimpleCounter<T>
where
    T: Eq + Hash,
{
    pub(crate) fn incr(&mut self, event: T) {
        self.total_count += 1;
        *self.inner.entry(event).or_insert(0) += 1;
    }
}

impl<T> Default for SimpleCounter<T>
where
    T: Eq + Hash,
{
    fn default() -> Self {
        SimpleCounter {
            inner: HashMap::new(),
            total_count: 0,
        }
    }
}

impl<T> Deref for SimpleCounter<T>
where
    T: Eq + Hash,
{
    type Target = HashMap<T, usize>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
