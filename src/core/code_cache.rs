use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

pub const DEFAULT_CACHE_CAPACITY: usize = 500;

#[derive(Debug, Default)]
struct Inner {
    codes: HashMap<String, String>,
    order: VecDeque<String>,
}

/// Script sources of recently posted scripts, looked up when a copy button
/// is clicked. Oldest entries are evicted once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct ScriptCodeCache {
    inner: Arc<RwLock<Inner>>,
    capacity: usize,
}

impl ScriptCodeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&self, id: &str, code: &str) {
        let Ok(mut inner) = self.inner.write() else {
            tracing::warn!("Script code cache lock poisoned, dropping {}", id);
            return;
        };

        if inner
            .codes
            .insert(id.to_string(), code.to_string())
            .is_none()
        {
            inner.order.push_back(id.to_string());
        }

        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.codes.remove(&oldest);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<String> {
        self.inner.read().ok()?.codes.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.codes.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ScriptCodeCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let cache = ScriptCodeCache::new(2);
        cache.insert("a", "print(1)");
        cache.insert("b", "print(2)");
        cache.insert("a", "print(11)");
        cache.insert("c", "print(3)");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b").as_deref(), Some("print(2)"));
        assert_eq!(cache.get("c").as_deref(), Some("print(3)"));
    }
}
