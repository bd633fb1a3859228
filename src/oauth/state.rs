use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::RngCore;
use tokio::sync::RwLock;

/// Default lifetime of a pending authorization: 10 minutes.
const STATE_TTL: Duration = Duration::from_secs(10 * 60);

struct PendingAuth {
    user_id: String,
    created_at: Instant,
}

/// Transient store of CSRF state tokens for in-flight authorization flows.
///
/// Tokens are single-use: lookup is destructive, so a replayed callback can
/// never match twice. Expired entries are pruned opportunistically on every
/// insert rather than by a background timer.
pub struct StateStore {
    entries: RwLock<HashMap<String, PendingAuth>>,
    ttl: Duration,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::with_ttl(STATE_TTL)
    }
}

impl StateStore {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Generate a fresh state token for `user_id` and register the pending
    /// authorization. Prunes expired entries while it holds the lock.
    pub async fn issue(&self, user_id: &str) -> String {
        let token = new_state_token();

        let mut entries = self.entries.write().await;
        entries.retain(|_, pending| pending.created_at.elapsed() <= self.ttl);
        entries.insert(
            token.clone(),
            PendingAuth {
                user_id: user_id.to_string(),
                created_at: Instant::now(),
            },
        );

        token
    }

    /// Destructively consume a state token, returning the user id it was
    /// issued for. Expired or unknown tokens yield `None`.
    pub async fn take(&self, token: &str) -> Option<String> {
        let pending = self.entries.write().await.remove(token)?;
        if pending.created_at.elapsed() > self.ttl {
            return None;
        }
        Some(pending.user_id)
    }
}

/// 16 random bytes, hex-encoded: 32 characters.
fn new_state_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
