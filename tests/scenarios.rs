//! Integration tests carrying the scenario table and testable-property
//! checks forward as one test function per scenario/property.

use pagepool::{BufferPoolManager, Error, ReplacementStrategy, StorageManager};
use tempfile::TempDir;

fn fresh_pool(num_frames: usize, strategy: ReplacementStrategy) -> (BufferPoolManager, TempDir) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pages.db");
    StorageManager::create(&path).unwrap();
    let pool = BufferPoolManager::init(&path, num_frames, strategy).unwrap();
    (pool, dir)
}

// S1: FIFO, N=3, pin/unpin 0,1,2,3 in sequence -> page 0 evicted first.
#[test]
fn s1_fifo_evicts_oldest_loaded() {
    let (mut pool, _dir) = fresh_pool(3, ReplacementStrategy::Fifo);
    for page in 0..4 {
        let h = pool.pin(page).unwrap();
        pool.unpin(h).unwrap();
    }
    assert_eq!(pool.frame_contents().unwrap(), vec![3, 1, 2]);
}

// S2: LRU, pin 0,1,2, re-pin 0, then pin 3 -> page 1 is LRU and is evicted.
#[test]
fn s2_lru_evicts_least_recently_used() {
    let (mut pool, _dir) = fresh_pool(3, ReplacementStrategy::Lru);
    for page in [0, 1, 2, 0, 3] {
        let h = pool.pin(page).unwrap();
        pool.unpin(h).unwrap();
    }
    // Compare the resident set, not a specific frame-index placement: page
    // 3 reuses whichever frame held the evicted page 1, an incidental slot
    // choice the invariant under test doesn't care about.
    let mut contents = pool.frame_contents().unwrap();
    contents.sort_unstable();
    assert_eq!(contents, vec![0, 2, 3]);
}

// S3: CLOCK, same access sequence as S2 -> page 1 evicted. Page 0 is
// re-pinned after all three are loaded, which advances the clock hand past
// it; the sweep for page 3 then lands back on page 1 first.
#[test]
fn s3_clock_evicts_unreferenced_page() {
    let (mut pool, _dir) = fresh_pool(3, ReplacementStrategy::Clock);
    for page in [0, 1, 2, 0, 3] {
        let h = pool.pin(page).unwrap();
        pool.unpin(h).unwrap();
    }
    let contents = pool.frame_contents().unwrap();
    assert!(contents.contains(&0));
    assert!(contents.contains(&2));
    assert!(contents.contains(&3));
    assert!(!contents.contains(&1));
}

// S4: pin 0, markDirty, unpin, forceFlushPool -> all clean, at least one write.
#[test]
fn s4_force_flush_pool_clears_dirty_unpinned_frames() {
    let (mut pool, _dir) = fresh_pool(3, ReplacementStrategy::Lru);
    let h0 = pool.pin(0).unwrap();
    pool.mark_dirty(h0).unwrap();
    pool.unpin(h0).unwrap();
    pool.force_flush_pool().unwrap();
    assert_eq!(pool.dirty_flags().unwrap(), vec![false, false, false]);
    assert!(pool.num_write_io().unwrap() >= 1);
}

// S5: pin pages 0,1,2 without unpinning (N=3), then pin 3 -> PoolFull.
#[test]
fn s5_pinning_every_frame_then_missing_fails_with_pool_full() {
    let (mut pool, _dir) = fresh_pool(3, ReplacementStrategy::Fifo);
    pool.pin(0).unwrap();
    pool.pin(1).unwrap();
    pool.pin(2).unwrap();
    let err = pool.pin(3).unwrap_err();
    assert!(matches!(err, Error::PoolFull));
}

// S6 / P4: write a page, shut down, reopen a fresh pool over the same
// file, and read the bytes back.
#[test]
fn s6_shutdown_then_reopen_recovers_last_written_bytes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pages.db");
    StorageManager::create(&path).unwrap();

    {
        let mut pool = BufferPoolManager::init(&path, 3, ReplacementStrategy::Lru).unwrap();
        let h0 = pool.pin(0).unwrap();
        pool.unpin(h0).unwrap();
        let h0 = pool.pin(0).unwrap();
        pool.unpin(h0).unwrap();

        let h1 = pool.pin(1).unwrap();
        pool.read_mut(h1).unwrap()[0..4].copy_from_slice(&[9, 9, 9, 9]);
        pool.mark_dirty(h1).unwrap();
        pool.shutdown().unwrap();
    }

    let mut pool = BufferPoolManager::init(&path, 3, ReplacementStrategy::Lru).unwrap();
    let h1 = pool.pin(1).unwrap();
    assert_eq!(&pool.read(h1).unwrap()[0..4], &[9, 9, 9, 9]);
}

// P1: sum of fix counts always equals outstanding pins minus unpins.
#[test]
fn p1_fix_count_sum_matches_outstanding_pins() {
    let (mut pool, _dir) = fresh_pool(4, ReplacementStrategy::Lru);
    let h0 = pool.pin(0).unwrap();
    let h1 = pool.pin(1).unwrap();
    let h0b = pool.pin(0).unwrap();
    assert_eq!(pool.fix_counts().unwrap().iter().sum::<u32>(), 3);
    pool.unpin(h0).unwrap();
    assert_eq!(pool.fix_counts().unwrap().iter().sum::<u32>(), 2);
    pool.unpin(h1).unwrap();
    pool.unpin(h0b).unwrap();
    assert_eq!(pool.fix_counts().unwrap().iter().sum::<u32>(), 0);
}

// P2: at most N distinct pages are resident, and all resident page
// numbers are pairwise distinct.
#[test]
fn p2_residency_is_bounded_and_distinct() {
    let (mut pool, _dir) = fresh_pool(3, ReplacementStrategy::Clock);
    for page in 0..10 {
        let h = pool.pin(page).unwrap();
        pool.unpin(h).unwrap();
    }
    let contents: Vec<_> = pool
        .frame_contents()
        .unwrap()
        .into_iter()
        .filter(|&p| p != pagepool::NO_PAGE)
        .collect();
    assert!(contents.len() <= 3);
    let mut sorted = contents.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), contents.len());
}

// P3: after forceFlushPool, every unpinned frame is clean.
#[test]
fn p3_force_flush_pool_leaves_unpinned_frames_clean() {
    let (mut pool, _dir) = fresh_pool(3, ReplacementStrategy::Lru);
    for page in 0..3 {
        let h = pool.pin(page).unwrap();
        pool.mark_dirty(h).unwrap();
        pool.unpin(h).unwrap();
    }
    pool.force_flush_pool().unwrap();
    for (dirty, fix) in pool
        .dirty_flags()
        .unwrap()
        .into_iter()
        .zip(pool.fix_counts().unwrap())
    {
        if fix == 0 {
            assert!(!dirty);
        }
    }
}

// P5: for LRU with N frames, the resident set equals the last N distinct
// pages accessed.
#[test]
fn p5_lru_residency_matches_last_n_distinct_accesses() {
    let (mut pool, _dir) = fresh_pool(3, ReplacementStrategy::Lru);
    for page in [0, 1, 2, 3, 4, 1, 5] {
        let h = pool.pin(page).unwrap();
        pool.unpin(h).unwrap();
    }
    // last 3 distinct accesses in recency order: 4, 1, 5
    let mut contents = pool.frame_contents().unwrap();
    contents.sort_unstable();
    let mut expected = vec![1, 4, 5];
    expected.sort_unstable();
    assert_eq!(contents, expected);
}

// P6: for FIFO, the resident set equals the last N distinct pages loaded
// (hits do not change which pages were loaded).
#[test]
fn p6_fifo_residency_matches_last_n_distinct_loads() {
    let (mut pool, _dir) = fresh_pool(3, ReplacementStrategy::Fifo);
    for page in [0, 1, 2, 3, 0] {
        let h = pool.pin(page).unwrap();
        pool.unpin(h).unwrap();
    }
    let mut contents = pool.frame_contents().unwrap();
    contents.sort_unstable();
    let mut expected = vec![0, 2, 3];
    expected.sort_unstable();
    assert_eq!(contents, expected);
}

// P7: for CLOCK, a page accessed since load is never evicted while an
// unreferenced unpinned page remains.
#[test]
fn p7_clock_never_evicts_referenced_page_while_alternative_exists() {
    let (mut pool, _dir) = fresh_pool(2, ReplacementStrategy::Clock);
    let h0 = pool.pin(0).unwrap();
    pool.unpin(h0).unwrap();
    let h0b = pool.pin(0).unwrap(); // re-access: used bit set
    pool.unpin(h0b).unwrap();

    let h1 = pool.pin(1).unwrap();
    pool.unpin(h1).unwrap();

    // Pool full (N=2, pages 0 and 1 resident); page 1 was never
    // re-referenced after its own load, page 0 was. Loading page 2 must
    // evict page 1, not page 0.
    let h2 = pool.pin(2).unwrap();
    pool.unpin(h2).unwrap();
    assert!(pool.frame_contents().unwrap().contains(&0));
}

#[test]
fn lru_k_falls_back_to_lru_behavior() {
    let (mut pool, _dir) = fresh_pool(3, ReplacementStrategy::LruK(2));
    for page in [0, 1, 2, 0, 3] {
        let h = pool.pin(page).unwrap();
        pool.unpin(h).unwrap();
    }
    let mut contents = pool.frame_contents().unwrap();
    contents.sort_unstable();
    assert_eq!(contents, vec![0, 2, 3]);
}
