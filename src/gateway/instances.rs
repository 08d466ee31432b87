//! Primary-provider instance pool: health tracking and round-robin rotation.
//!
//! Rotation rules:
//! - HEALTHY instances come first, DEGRADED after them (fewest consecutive
//!   failures first), DEAD ones only once their cooldown has elapsed.
//! - The cursor advances by one per plan so load spreads across instances.
//! - A plan is never empty: if nothing is eligible, the instance whose last
//!   failure is oldest is offered anyway.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceHealth {
    Healthy,
    Degraded,
    Dead,
}

/// One interchangeable endpoint of the primary provider.
#[derive(Debug, Clone)]
pub struct ProviderInstance {
    pub url: String,
    pub position: usize,
    pub health: InstanceHealth,
    consecutive_failures: u32,
    total_failures: u64,
    successes: u64,
    last_failure: Option<Instant>,
    last_error: Option<String>,
}

impl ProviderInstance {
    fn new(url: String, position: usize) -> Self {
        Self {
            url,
            position,
            health: InstanceHealth::Healthy,
            consecutive_failures: 0,
            total_failures: 0,
            successes: 0,
            last_failure: None,
            last_error: None,
        }
    }

    fn eligible(&self, now: Instant, cooldown: Duration) -> bool {
        match self.health {
            InstanceHealth::Healthy | InstanceHealth::Degraded => true,
            InstanceHealth::Dead => self
                .last_failure
                .map_or(true, |t| now.duration_since(t) >= cooldown),
        }
    }
}

/// Serializable view of one instance for `/api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSnapshot {
    pub url: String,
    pub position: usize,
    pub health: InstanceHealth,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub successes: u64,
    pub last_error: Option<String>,
    pub secs_since_failure: Option<u64>,
}

#[derive(Debug)]
struct PoolState {
    instances: Vec<ProviderInstance>,
    cursor: usize,
}

#[derive(Debug)]
pub struct InstancePool {
    inner: Mutex<PoolState>,
    cooldown: Duration,
    dead_after: u32,
}

impl InstancePool {
    pub fn new(urls: Vec<String>, cooldown: Duration, dead_after: u32) -> Self {
        let instances = urls
            .into_iter()
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .enumerate()
            .map(|(i, u)| ProviderInstance::new(u, i))
            .collect();
        Self {
            inner: Mutex::new(PoolState {
                instances,
                cursor: 0,
            }),
            cooldown,
            dead_after: dead_after.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `max_attempts` distinct instance URLs to try, in order.
    pub fn plan(&self, max_attempts: usize) -> Vec<String> {
        let now = Instant::now();
        let mut state = self.lock();
        let n = state.instances.len();
        if n == 0 || max_attempts == 0 {
            return Vec::new();
        }

        let start = state.cursor % n;
        state.cursor = (start + 1) % n;

        let ring: Vec<&ProviderInstance> = (0..n)
            .map(|i| &state.instances[(start + i) % n])
            .collect();

        let mut healthy = Vec::new();
        let mut degraded = Vec::new();
        for inst in ring.iter().filter(|i| i.eligible(now, self.cooldown)) {
            match inst.health {
                InstanceHealth::Healthy => healthy.push(*inst),
                _ => degraded.push(*inst),
            }
        }
        // Stable sort keeps ring order among equals.
        degraded.sort_by_key(|i| i.consecutive_failures);

        let mut plan: Vec<String> = healthy
            .into_iter()
            .chain(degraded)
            .take(max_attempts)
            .map(|i| i.url.clone())
            .collect();

        if plan.is_empty() {
            if let Some(oldest) = state
                .instances
                .iter()
                .min_by_key(|i| i.last_failure.unwrap_or(now))
            {
                plan.push(oldest.url.clone());
            }
        }
        plan
    }

    pub fn mark_success(&self, url: &str) {
        let mut state = self.lock();
        if let Some(inst) = state.instances.iter_mut().find(|i| i.url == url) {
            inst.consecutive_failures = 0;
            inst.successes += 1;
            inst.health = InstanceHealth::Healthy;
        }
    }

    pub fn mark_failure(&self, url: &str, err: &ProviderError) {
        let mut state = self.lock();
        if let Some(inst) = state.instances.iter_mut().find(|i| i.url == url) {
            inst.consecutive_failures += 1;
            inst.total_failures += 1;
            inst.last_failure = Some(Instant::now());
            inst.last_error = Some(err.to_string());
            inst.health = if inst.consecutive_failures >= self.dead_after {
                InstanceHealth::Dead
            } else {
                InstanceHealth::Degraded
            };
        }
    }

    pub fn snapshot(&self) -> Vec<InstanceSnapshot> {
        let now = Instant::now();
        self.lock()
            .instances
            .iter()
            .map(|i| InstanceSnapshot {
                url: i.url.clone(),
                position: i.position,
                health: i.health,
                consecutive_failures: i.consecutive_failures,
                total_failures: i.total_failures,
                successes: i.successes,
                last_error: i.last_error.clone(),
                secs_since_failure: i.last_failure.map(|t| now.duration_since(t).as_secs()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> InstancePool {
        let urls = (0..n).map(|i| format!("https://inst{i}.example/")).collect();
        InstancePool::new(urls, Duration::from_secs(60), 3)
    }

    #[test]
    fn plan_rotates_round_robin() {
        let p = pool(3);
        assert_eq!(p.plan(1), vec!["https://inst0.example"]);
        assert_eq!(p.plan(1), vec!["https://inst1.example"]);
        assert_eq!(p.plan(1), vec!["https://inst2.example"]);
        assert_eq!(p.plan(1), vec!["https://inst0.example"]);
    }

    #[test]
    fn plan_covers_distinct_instances_up_to_ceiling() {
        let p = pool(4);
        let plan = p.plan(3);
        assert_eq!(plan.len(), 3);
        let mut dedup = plan.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), 3);
    }

    #[test]
    fn degraded_instances_are_tried_after_healthy_ones() {
        let p = pool(3);
        p.mark_failure("https://inst0.example", &ProviderError::Timeout(10));
        let plan = p.plan(3);
        assert_eq!(plan.last().map(String::as_str), Some("https://inst0.example"));
    }

    #[test]
    fn dead_instances_wait_for_cooldown_but_never_leave_zero_candidates() {
        let p = pool(2);
        for _ in 0..3 {
            p.mark_failure("https://inst0.example", &ProviderError::RateLimited);
            p.mark_failure("https://inst1.example", &ProviderError::RateLimited);
        }
        let snap = p.snapshot();
        assert!(snap.iter().all(|s| s.health == InstanceHealth::Dead));

        let plan = p.plan(4);
        assert_eq!(plan.len(), 1, "one instance must stay eligible for retry");
    }

    #[test]
    fn success_restores_health() {
        let p = pool(1);
        p.mark_failure("https://inst0.example", &ProviderError::Http(502));
        assert_eq!(p.snapshot()[0].health, InstanceHealth::Degraded);
        p.mark_success("https://inst0.example");
        let s = &p.snapshot()[0];
        assert_eq!(s.health, InstanceHealth::Healthy);
        assert_eq!(s.consecutive_failures, 0);
        assert_eq!(s.total_failures, 1);
        assert_eq!(s.successes, 1);
    }
}
