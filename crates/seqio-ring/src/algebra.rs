//! Circular-buffer index algebra.
//!
//! Indices live in a doubled space `[0, 2N)` where `N` is the ring
//! capacity. An index modulo `N` is a buffer offset; comparing producer
//! and consumer indices in the doubled space distinguishes empty
//! (`p == c`) from full (`|p - c| == N`) without reserving a slot.
//! Both indices advance modulo `2N`.
//!
//! Reachable states always satisfy `producer_free + consumer_free == N`
//! and neither index ever laps the other; the functions below assume
//! (and debug-assert) those invariants.

/// Largest supported ring capacity: half the index range, so the
/// doubled space fits the index type.
pub const fn max_ring_size() -> u32 {
    u32::MAX / 2
}

/// Buffer offset of index `idx`.
#[inline]
pub fn offset(idx: u32, n: u32) -> u32 {
    debug_assert!(n >= 1 && n <= max_ring_size());
    debug_assert!(idx < 2 * n);
    if idx >= n {
        idx - n
    } else {
        idx
    }
}

/// Advance `idx` by `count` slots in the doubled space.
#[inline]
pub fn advance(idx: u32, count: u32, n: u32) -> u32 {
    debug_assert!(n >= 1 && n <= max_ring_size());
    debug_assert!(count <= n);
    debug_assert!(idx < 2 * n);
    // Ordered so no intermediate exceeds u32: in the wrapping branch
    // idx >= n holds.
    if 2 * n - idx > count {
        idx + count
    } else {
        (idx - n) + count - n
    }
}

/// Free slots the producer may write.
#[inline]
pub fn producer_free(producer_index: u32, consumer_index: u32, n: u32) -> u32 {
    debug_assert!(n >= 1 && n <= max_ring_size());
    let p = producer_index;
    let c = consumer_index;
    if p >= c {
        n - (p - c)
    } else {
        c - n - p
    }
}

/// Slots the consumer may read.
#[inline]
pub fn consumer_free(producer_index: u32, consumer_index: u32, n: u32) -> u32 {
    debug_assert!(n >= 1 && n <= max_ring_size());
    let p = producer_index;
    let c = consumer_index;
    if c <= p {
        p - c
    } else {
        2 * n - c + p
    }
}

/// Clamp `count` slots starting at buffer offset `offset` to the
/// contiguous run before the wrap point.
#[inline]
pub fn contiguous(offset: u32, count: u32, n: u32) -> u32 {
    count.min(n - offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Walk every reachable (p, c) pair for a small ring.
    fn for_each_reachable(n: u32, mut f: impl FnMut(u32, u32)) {
        for p in 0..2 * n {
            for c in 0..2 * n {
                // Producer lead in the doubled space; reachable states
                // keep it within [0, n].
                let lead = (p + 2 * n - c) % (2 * n);
                if lead <= n {
                    f(p, c);
                }
            }
        }
    }

    #[test]
    fn free_slots_partition_the_ring() {
        for n in [1u32, 2, 3, 4, 7, 8] {
            for_each_reachable(n, |p, c| {
                assert_eq!(
                    producer_free(p, c, n) + consumer_free(p, c, n),
                    n,
                    "n={} p={} c={}",
                    n,
                    p,
                    c
                );
            });
        }
    }

    #[test]
    fn empty_and_full_are_distinct() {
        let n = 4;
        // Same index: empty.
        assert_eq!(consumer_free(5, 5, n), 0);
        assert_eq!(producer_free(5, 5, n), n);
        // Mirror distance n: full.
        assert_eq!(producer_free(n, 0, n), 0);
        assert_eq!(consumer_free(n, 0, n), n);
    }

    #[test]
    fn advancing_producer_grows_consumer_side() {
        for n in [1u32, 3, 4, 8] {
            for_each_reachable(n, |p, c| {
                let free = producer_free(p, c, n);
                for k in 0..=free {
                    let p2 = advance(p, k, n);
                    assert_eq!(consumer_free(p2, c, n), consumer_free(p, c, n) + k);
                    assert_eq!(producer_free(p2, c, n), free - k);
                }
            });
        }
    }

    #[test]
    fn advancing_consumer_grows_producer_side() {
        for n in [1u32, 3, 4, 8] {
            for_each_reachable(n, |p, c| {
                let free = consumer_free(p, c, n);
                for k in 0..=free {
                    let c2 = advance(c, k, n);
                    assert_eq!(producer_free(p, c2, n), producer_free(p, c, n) + k);
                    assert_eq!(consumer_free(p, c2, n), free - k);
                }
            });
        }
    }

    #[test]
    fn advance_matches_modular_offset() {
        for n in [1u32, 2, 5, 8] {
            for idx in 0..2 * n {
                for k in 0..=n {
                    let a = advance(idx, k, n);
                    assert!(a < 2 * n);
                    assert_eq!(offset(a, n), (offset(idx, n) + k) % n);
                }
            }
        }
    }

    #[test]
    fn contiguous_stops_at_wrap() {
        let n = 8;
        assert_eq!(contiguous(0, 8, n), 8);
        assert_eq!(contiguous(6, 8, n), 2);
        assert_eq!(contiguous(6, 1, n), 1);
        assert_eq!(contiguous(7, 0, n), 0);
    }

    #[test]
    fn wrap_sequence_round_trips() {
        // March an index all the way around the doubled space.
        let n = 4;
        let mut idx = 0u32;
        for step in 0..32 {
            let k = (step % (n as usize + 1)) as u32;
            let before = offset(idx, n);
            idx = advance(idx, k, n);
            assert_eq!(offset(idx, n), (before + k) % n);
        }
    }
}
