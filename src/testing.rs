//! Per-thread lookup tracking for tests of memoized functions.

use std::cell::Cell;

#[derive(Clone, Copy)]
struct Lookups {
    last_hit: bool,
    misses: usize,
}

thread_local! {
    static LOOKUPS: Cell<Lookups> = const { Cell::new(Lookups { last_hit: false, misses: 0 }) };
}

/// Whether the most recent memoized call on this thread returned a stored
/// result instead of running the function.
pub fn last_was_hit() -> bool {
    LOOKUPS.get().last_hit
}

/// How many memoized calls on this thread ran their function so far.
pub fn misses() -> usize {
    LOOKUPS.get().misses
}

pub(crate) fn register_hit() {
    LOOKUPS.set(Lookups { last_hit: true, ..LOOKUPS.get() });
}

pub(crate) fn register_miss() {
    let lookups = LOOKUPS.get();
    LOOKUPS.set(Lookups { last_hit: false, misses: lookups.misses + 1 });
}
