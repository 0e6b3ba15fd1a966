use cache_entry::{CacheEntry, EntryError, ExpirationPolicy, TokioClock};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{Level, info};

const SESSION_TTL_MS: i64 = 2_000;
const SESSION_IDLE_MS: i64 = 500;

type Sessions = RwLock<HashMap<String, Arc<CacheEntry<String, String, TokioClock>>>>;

fn sweep(sessions: &Sessions) -> usize {
    let expired: Vec<_> = sessions
        .read()
        .map(|map| {
            map.values()
                .filter(|entry| entry.is_expired())
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let mut removed = 0;
    for entry in expired {
        entry.lock().with(|| {
            if !entry.is_expired() {
                return;
            }
            if let Ok(mut map) = sessions.write() {
                if map.get(entry.key()).is_some_and(|e| Arc::ptr_eq(e, &entry)) {
                    map.remove(entry.key());
                    removed += 1;
                }
            }
        });
    }
    removed
}

#[tokio::main]
async fn main() -> Result<(), EntryError> {
    tracing_subscriber::fmt().with_max_level(Level::TRACE).init();

    let policy = ExpirationPolicy::from_millis(SESSION_TTL_MS, SESSION_IDLE_MS)?;
    let clock = TokioClock::new();
    let sessions: Sessions = RwLock::new(HashMap::new());

    for user in ["alice", "bob"] {
        let entry =
            CacheEntry::with_clock(user.to_string(), format!("token-{user}"), policy, clock);
        info!(user, expire_time = ?entry.expire_time(), "session created");
        if let Ok(mut map) = sessions.write() {
            map.insert(user.to_string(), Arc::new(entry));
        }
    }

    // alice stays active, bob goes idle
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(300)).await;
        if let Some(entry) = sessions.read().ok().and_then(|m| m.get("alice").cloned()) {
            info!(token = %entry.value(), "alice read the session");
        }
        info!(removed = sweep(&sessions), "sweep finished");
    }

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    info!(removed = sweep(&sessions), "sweep after ttl");

    let remaining = sessions.read().map(|m| m.len()).unwrap_or(0);
    info!(remaining, "demo finished");

    Ok(())
}
