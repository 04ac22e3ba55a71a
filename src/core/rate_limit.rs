use crate::config::RateLimitRule;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { limit: usize, remaining: usize },
    Limited { limit: usize, retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: usize,
}

/// 固定視窗計數器，每個 `<rule>:<client>` 一個視窗
pub struct RateLimiter {
    rules: BTreeMap<String, RateLimitRule>,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(rules: BTreeMap<String, RateLimitRule>) -> Self {
        Self {
            rules,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn rule(&self, name: &str) -> Option<RateLimitRule> {
        self.rules.get(name).copied()
    }

    /// 記錄一次請求並判斷是否放行；未知規則一律放行
    pub fn check(&self, rule_name: &str, client_key: &str) -> RateLimitDecision {
        self.check_at(rule_name, client_key, Instant::now())
    }

    fn check_at(&self, rule_name: &str, client_key: &str, now: Instant) -> RateLimitDecision {
        let Some(rule) = self.rule(rule_name) else {
            return RateLimitDecision::Allowed {
                limit: usize::MAX,
                remaining: usize::MAX,
            };
        };
        let window_len = Duration::from_secs(rule.window_secs);
        let key = format!("{}:{}", rule_name, client_key);

        // 鎖中毒時沿用內部資料，計數器不影響一致性
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // 清除已過期的視窗
        let rules = &self.rules;
        windows.retain(|k, w| {
            let window_secs = k
                .split_once(':')
                .and_then(|(name, _)| rules.get(name))
                .map(|r| r.window_secs)
                .unwrap_or(0);
            now.duration_since(w.started) < Duration::from_secs(window_secs)
        });

        let window = windows.entry(key).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= window_len {
            window.started = now;
            window.count = 0;
        }

        if window.count >= rule.max_requests {
            let retry_after = window_len.saturating_sub(now.duration_since(window.started));
            tracing::warn!(
                "🚦 Rate limit `{}` exceeded for {} (retry in {}s)",
                rule_name,
                client_key,
                retry_after.as_secs()
            );
            return RateLimitDecision::Limited {
                limit: rule.max_requests,
                retry_after,
            };
        }

        window.count += 1;
        RateLimitDecision::Allowed {
            limit: rule.max_requests,
            remaining: rule.max_requests - window.count,
        }
    }
}
