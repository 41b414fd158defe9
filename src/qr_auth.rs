//! One-time token storage backing the QR pairing flow.

use crate::config::{unix_now, SharedConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

const STORE_CAP: usize = 8192;
const MIN_TTL_S: i64 = 10;

#[derive(Debug, Clone, Copy)]
struct QrToken {
    created_ts: f64,
    expires_ts: f64,
}

/// Single-use QR token store with TTL and a bounded size.
pub struct QrTokenStore {
    config: SharedConfig,
    tokens: Mutex<HashMap<String, QrToken>>,
}

impl QrTokenStore {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    fn ttl_s(&self) -> i64 {
        self.config.read().qr_token_ttl_s.max(MIN_TTL_S)
    }

    fn cleanup_locked(map: &mut HashMap<String, QrToken>, now: f64) {
        map.retain(|_, t| now < t.expires_ts);
        if map.len() <= STORE_CAP {
            return;
        }
        let mut by_age: Vec<(String, f64)> = map
            .iter()
            .map(|(k, t)| (k.clone(), t.created_ts))
            .collect();
        by_age.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        let evict = map.len() - STORE_CAP;
        for (key, _) in by_age.into_iter().take(evict) {
            map.remove(&key);
        }
    }

    /// Issue a new single-use token valid for the configured TTL.
    pub fn issue(&self) -> String {
        self.issue_at(unix_now())
    }

    pub fn issue_at(&self, now: f64) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let ttl = self.ttl_s() as f64;
        let mut map = self.tokens.lock();
        Self::cleanup_locked(&mut map, now);
        map.insert(
            token.clone(),
            QrToken {
                created_ts: now,
                expires_ts: now + ttl,
            },
        );
        token
    }

    /// Atomically remove the token; true only when it existed and was
    /// still valid at the moment of consumption.
    pub fn consume(&self, token: &str) -> bool {
        self.consume_at(token, unix_now())
    }

    pub fn consume_at(&self, token: &str, now: f64) -> bool {
        let key = token.trim();
        if key.is_empty() {
            return false;
        }
        let mut map = self.tokens.lock();
        Self::cleanup_locked(&mut map, now);
        match map.remove(key) {
            Some(t) => now < t.expires_ts,
            None => false,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.tokens.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ttl_s: i64) -> QrTokenStore {
        let config = crate::config::shared_from_env();
        config.write().qr_token_ttl_s = ttl_s;
        QrTokenStore::new(config)
    }

    #[test]
    fn token_is_single_use() {
        let s = store(120);
        let token = s.issue_at(100.0);
        assert!(s.consume_at(&token, 101.0));
        assert!(!s.consume_at(&token, 102.0));
    }

    #[test]
    fn expired_token_is_rejected() {
        let s = store(120);
        let token = s.issue_at(100.0);
        assert!(!s.consume_at(&token, 100.0 + 121.0));
    }

    #[test]
    fn blank_tokens_are_rejected() {
        let s = store(120);
        assert!(!s.consume_at("", 100.0));
        assert!(!s.consume_at("   ", 100.0));
    }

    #[test]
    fn ttl_has_a_floor() {
        let s = store(1);
        let token = s.issue_at(100.0);
        // Even with a 1-second configured TTL the token lives 10 seconds.
        assert!(s.consume_at(&token, 105.0));
    }

    #[test]
    fn store_is_capped() {
        let s = store(3600);
        for i in 0..(STORE_CAP + 16) {
            s.issue_at(100.0 + i as f64);
        }
        assert!(s.len() <= STORE_CAP + 1);
    }
}
