use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// 失败节点冷却缓存
///
/// 记录节点地址到"在此之前不可用"的时间点。过期条目在写入和显式清理时惰性删除，
/// 读取时只比较时间，不修改内容。
#[derive(Debug, Default)]
pub struct CooldownCache {
    entries: RwLock<HashMap<String, Instant>>,
    total_marks: AtomicU64,
}

impl CooldownCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记节点失败，在 `now + cooldown` 之前不参与轮询
    ///
    /// 冷却时间为 0 时不做任何记录。
    pub fn mark_failed(&self, uri: &str, now: Instant, cooldown: Duration) {
        if cooldown.is_zero() {
            return;
        }

        let until = now + cooldown;
        let mut entries = self.entries.write();
        Self::cleanup_expired_entries(&mut entries, now);
        entries.insert(uri.to_string(), until);
        self.total_marks.fetch_add(1, Ordering::Relaxed);

        debug!(
            "Marked {} as failed, excluded for {}ms",
            uri,
            cooldown.as_millis()
        );
    }

    /// 节点是否可被选择：没有记录或记录已过期
    pub fn is_eligible(&self, uri: &str, now: Instant) -> bool {
        match self.entries.read().get(uri) {
            Some(until) => now >= *until,
            None => true,
        }
    }

    /// 冷却最早结束的节点，用于所有节点都在冷却时的兜底选择
    pub fn least_recently_cooled<'a, I>(&self, uris: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let entries = self.entries.read();
        uris.into_iter()
            .min_by_key(|uri| entries.get(*uri).copied())
    }

    /// 清理所有已过期的条目
    pub fn purge_expired(&self, now: Instant) {
        let mut entries = self.entries.write();
        Self::cleanup_expired_entries(&mut entries, now);
    }

    fn cleanup_expired_entries(entries: &mut HashMap<String, Instant>, now: Instant) {
        entries.retain(|uri, until| {
            let keep = now < *until;
            if !keep {
                trace!("Removed expired cooldown entry: {}", uri);
            }
            keep
        });
    }

    /// 当前记录数（可能包含尚未清理的过期条目）
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn get_stats(&self, now: Instant) -> CooldownStats {
        let entries = self.entries.read();
        CooldownStats {
            cooling_nodes: entries.values().filter(|until| now < **until).count(),
            total_marks: self.total_marks.load(Ordering::Relaxed),
        }
    }
}

/// 冷却统计信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownStats {
    pub cooling_nodes: usize,
    pub total_marks: u64,
}

impl std::fmt::Display for CooldownStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cooldown Stats: {} nodes cooling, {} marks total",
            self.cooling_nodes, self.total_marks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_node_is_eligible() {
        let cache = CooldownCache::new();
        assert!(cache.is_eligible("http://a", Instant::now()));
    }

    #[test]
    fn test_node_excluded_until_cooldown_elapses() {
        let cache = CooldownCache::new();
        let now = Instant::now();
        let cooldown = Duration::from_millis(500);

        cache.mark_failed("http://a", now, cooldown);

        assert!(!cache.is_eligible("http://a", now));
        assert!(!cache.is_eligible("http://a", now + Duration::from_millis(499)));
        assert!(cache.is_eligible("http://a", now + cooldown));
        assert!(cache.is_eligible("http://b", now));
    }

    #[test]
    fn test_zero_cooldown_disables_marking() {
        let cache = CooldownCache::new();
        let now = Instant::now();

        cache.mark_failed("http://a", now, Duration::ZERO);

        assert!(cache.is_eligible("http://a", now));
        assert!(cache.is_empty());
        assert_eq!(cache.get_stats(now).total_marks, 0);
    }

    #[test]
    fn test_expired_entries_are_purged_lazily() {
        let cache = CooldownCache::new();
        let now = Instant::now();

        cache.mark_failed("http://a", now, Duration::from_millis(100));
        assert_eq!(cache.len(), 1);

        // 写入新条目时清理过期条目
        let later = now + Duration::from_millis(200);
        cache.mark_failed("http://b", later, Duration::from_millis(100));
        assert_eq!(cache.len(), 1);
        assert!(cache.is_eligible("http://a", later));

        cache.purge_expired(later + Duration::from_millis(100));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_least_recently_cooled_prefers_earliest_expiry() {
        let cache = CooldownCache::new();
        let now = Instant::now();
        let cooldown = Duration::from_secs(1);

        cache.mark_failed("http://b", now, cooldown);
        cache.mark_failed("http://a", now + Duration::from_millis(10), cooldown);
        cache.mark_failed("http://c", now + Duration::from_millis(20), cooldown);

        let uris = ["http://a", "http://b", "http://c"];
        assert_eq!(cache.least_recently_cooled(uris), Some("http://b"));
    }

    #[test]
    fn test_stats() {
        let cache = CooldownCache::new();
        let now = Instant::now();

        cache.mark_failed("http://a", now, Duration::from_secs(1));
        cache.mark_failed("http://a", now, Duration::from_secs(1));
        cache.mark_failed("http://b", now, Duration::from_secs(1));

        let stats = cache.get_stats(now);
        assert_eq!(stats.cooling_nodes, 2);
        assert_eq!(stats.total_marks, 3);
        assert_eq!(
            stats.to_string(),
            "Cooldown Stats: 2 nodes cooling, 3 marks total"
        );
    }
}
