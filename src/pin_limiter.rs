//! Per-IP PIN brute-force defense.
//!
//! A failure window counter per source address; exceeding the configured
//! budget blocks the address for a fixed period. The map is bounded and
//! self-cleaning so hostile traffic cannot grow it without limit.

use crate::config::{unix_now, SharedConfig};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct IpRecord {
    fails: u32,
    first_fail_ts: f64,
    blocked_until_ts: f64,
    last_activity_ts: f64,
}

pub struct PinLimiter {
    config: SharedConfig,
    by_ip: Mutex<HashMap<String, IpRecord>>,
}

impl PinLimiter {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            by_ip: Mutex::new(HashMap::new()),
        }
    }

    fn cleanup_locked(&self, map: &mut HashMap<String, IpRecord>, now: f64) {
        let (stale_s, max_ips) = {
            let cfg = self.config.read();
            (cfg.pin_state_stale_s as f64, cfg.pin_state_max_ips)
        };
        if stale_s > 0.0 {
            map.retain(|_, rec| now - rec.last_activity_ts <= stale_s);
        }
        if map.len() > max_ips {
            let mut by_age: Vec<(String, f64)> = map
                .iter()
                .map(|(ip, rec)| (ip.clone(), rec.last_activity_ts))
                .collect();
            by_age.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            let evict = map.len() - max_ips;
            for (ip, _) in by_age.into_iter().take(evict) {
                map.remove(&ip);
            }
        }
    }

    /// Whether `ip` may attempt a PIN right now; on denial, the number of
    /// whole seconds until the block lifts.
    pub fn check(&self, ip: &str) -> (bool, u64) {
        self.check_at(ip, unix_now())
    }

    pub fn check_at(&self, ip: &str, now: f64) -> (bool, u64) {
        let window_s = self.config.read().pin_window_s as f64;
        let mut map = self.by_ip.lock();
        self.cleanup_locked(&mut map, now);

        let Some(rec) = map.get_mut(ip) else {
            return (true, 0);
        };
        rec.last_activity_ts = now;
        if rec.blocked_until_ts > now {
            return (false, (rec.blocked_until_ts - now).ceil().max(1.0) as u64);
        }
        if now - rec.first_fail_ts > window_s {
            rec.fails = 0;
            rec.first_fail_ts = now;
        }
        (true, 0)
    }

    /// Count a wrong PIN; starts the block once the budget is spent.
    pub fn record_failure(&self, ip: &str) {
        self.record_failure_at(ip, unix_now())
    }

    pub fn record_failure_at(&self, ip: &str, now: f64) {
        let (window_s, max_fails, block_s) = {
            let cfg = self.config.read();
            (cfg.pin_window_s as f64, cfg.pin_max_fails, cfg.pin_block_s as f64)
        };
        let mut map = self.by_ip.lock();
        self.cleanup_locked(&mut map, now);

        let rec = map.entry(ip.to_string()).or_insert_with(|| IpRecord {
            first_fail_ts: now,
            ..IpRecord::default()
        });
        if now - rec.first_fail_ts > window_s {
            rec.fails = 0;
            rec.first_fail_ts = now;
        }
        rec.fails += 1;
        rec.last_activity_ts = now;
        if rec.fails >= max_fails {
            rec.blocked_until_ts = now + block_s;
        }
    }

    /// A correct PIN clears the address entirely.
    pub fn record_success(&self, ip: &str) {
        self.by_ip.lock().remove(ip);
    }

    pub fn reset(&self) {
        self.by_ip.lock().clear();
    }

    #[cfg(test)]
    fn tracked_ips(&self) -> usize {
        self.by_ip.lock().len()
    }

    #[cfg(test)]
    fn contains(&self, ip: &str) -> bool {
        self.by_ip.lock().contains_key(ip)
    }

    #[cfg(test)]
    fn fails_for(&self, ip: &str) -> u32 {
        self.by_ip.lock().get(ip).map(|r| r.fails).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(window_s: i64, max_fails: u32, block_s: i64) -> PinLimiter {
        let config = crate::config::shared_from_env();
        {
            let mut cfg = config.write();
            cfg.pin_window_s = window_s;
            cfg.pin_max_fails = max_fails;
            cfg.pin_block_s = block_s;
            cfg.pin_state_stale_s = 7200;
            cfg.pin_state_max_ips = 4096;
        }
        PinLimiter::new(config)
    }

    #[test]
    fn check_returns_retry_after_when_blocked() {
        let l = limiter(60, 2, 30);
        l.record_failure_at("10.10.0.1", 100.0);
        l.record_failure_at("10.10.0.1", 101.0);
        let (allowed, retry_after) = l.check_at("10.10.0.1", 102.0);
        assert!(!allowed);
        assert!(retry_after >= 1);
    }

    #[test]
    fn retry_after_decreases_over_time() {
        let l = limiter(60, 1, 30);
        l.record_failure_at("10.10.0.9", 100.0);
        let (_, r1) = l.check_at("10.10.0.9", 101.0);
        let (_, r2) = l.check_at("10.10.0.9", 110.0);
        assert!(r2 <= r1);
        let (allowed, r3) = l.check_at("10.10.0.9", 131.0);
        assert!(allowed);
        assert_eq!(r3, 0);
    }

    #[test]
    fn window_elapse_resets_fail_counter() {
        let l = limiter(5, 3, 30);
        l.record_failure_at("10.10.0.2", 200.0);
        let (allowed, retry_after) = l.check_at("10.10.0.2", 210.0);
        assert!(allowed);
        assert_eq!(retry_after, 0);
        assert_eq!(l.fails_for("10.10.0.2"), 0);
    }

    #[test]
    fn cleanup_caps_ip_map_size() {
        let l = limiter(60, 8, 300);
        l.config.write().pin_state_max_ips = 3;
        for i in 0..8 {
            l.record_failure_at(&format!("10.0.0.{}", i), 1000.0 + i as f64);
        }
        assert!(l.tracked_ips() <= 3);
    }

    #[test]
    fn cleanup_removes_stale_entries() {
        let l = limiter(60, 8, 300);
        l.config.write().pin_state_stale_s = 10;
        l.record_failure_at("10.0.0.10", 100.0);
        l.record_failure_at("10.0.0.11", 100.0);
        // Maintenance runs inside check once the stale timeout elapsed.
        l.check_at("10.0.0.12", 200.0);
        assert!(!l.contains("10.0.0.10"));
        assert!(!l.contains("10.0.0.11"));
    }

    #[test]
    fn success_and_reset_clear_state() {
        let l = limiter(60, 8, 300);
        l.record_failure_at("10.10.0.3", 300.0);
        l.record_failure_at("10.10.0.4", 301.0);
        assert!(l.contains("10.10.0.3"));
        assert!(l.contains("10.10.0.4"));

        l.record_success("10.10.0.3");
        assert!(!l.contains("10.10.0.3"));

        l.reset();
        assert_eq!(l.tracked_ips(), 0);
    }
}
