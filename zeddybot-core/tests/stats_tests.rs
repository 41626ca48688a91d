// File: zeddybot-core/tests/stats_tests.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use zeddybot_common::models::PlatformEvent;
use zeddybot_core::cache::StatsCache;
use zeddybot_core::test_utils::helpers::{StaticRoster, roster_of};

#[test]
fn test_guild_with_bots_and_offline_members() {
    let roster = Arc::new(StaticRoster::default());
    roster.set(Some(roster_of("Zeddy's Den", 17, 2, 4)));
    let cache = StatsCache::new(roster);
    cache.mark_connected();

    let snap = cache.read();
    assert_eq!(snap.total_count, 17);
    assert_eq!(snap.human_count, 15);
    assert_eq!(snap.online_count, 4);
    assert!(snap.connected);
    assert_eq!(snap.source_name, "Zeddy's Den");
}

#[test]
fn test_connection_drop_keeps_counts() {
    let roster = Arc::new(StaticRoster::default());
    roster.set(Some(roster_of("Zeddy's Den", 17, 2, 4)));
    let cache = StatsCache::new(roster.clone());
    cache.mark_connected();
    let live = cache.read();

    cache.mark_disconnected();
    roster.set(None);
    cache.update(&PlatformEvent::PresenceChanged { user_id: "user-3".into() });

    let stale = cache.read();
    assert!(!stale.connected);
    assert_eq!(stale.total_count, 17);
    assert_eq!(stale.human_count, 15);
    assert_eq!(stale.online_count, 4);
    assert_eq!(stale.last_updated, live.last_updated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_never_mix_two_updates() {
    let roster = Arc::new(StaticRoster::default());
    let cache = Arc::new(StatsCache::new(roster.clone()));
    let done = Arc::new(AtomicBool::new(false));
    cache.mark_connected();

    let writer = {
        let cache = cache.clone();
        let roster = roster.clone();
        let done = done.clone();
        tokio::spawn(async move {
            for i in 0..500usize {
                // Each roster has total = 10 + i and humans = total - 2.
                roster.set(Some(roster_of("g", 10 + i, 2, i % 5)));
                cache.update(&PlatformEvent::MemberJoined { user_id: i.to_string() });
                tokio::task::yield_now().await;
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let reader = {
        let cache = cache.clone();
        tokio::spawn(async move {
            while !done.load(Ordering::SeqCst) {
                let snap = cache.read();
                if snap.connected {
                    assert_eq!(snap.human_count + 2, snap.total_count);
                    assert!(snap.online_count <= snap.human_count);
                }
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_background_resync_cannot_revive_dropped_link() {
    let roster = Arc::new(StaticRoster::default());
    roster.set(Some(roster_of("Zeddy's Den", 17, 2, 4)));
    let cache = Arc::new(StatsCache::new(roster.clone()));
    let done = Arc::new(AtomicBool::new(false));

    let resyncer = {
        let cache = cache.clone();
        let done = done.clone();
        tokio::spawn(async move {
            while !done.load(Ordering::SeqCst) {
                cache.resync();
                tokio::task::yield_now().await;
            }
        })
    };

    for _ in 0..200 {
        cache.mark_connected();
        tokio::task::yield_now().await;
        cache.mark_disconnected();
        // Anything the resync loop does from here on must keep the snapshot stale.
        for _ in 0..5 {
            tokio::task::yield_now().await;
            assert!(!cache.read().connected);
        }
    }

    done.store(true, Ordering::SeqCst);
    resyncer.await.unwrap();
    assert!(!cache.read().connected);
    assert_eq!(cache.read().total_count, 17);
}
