use std::sync::Mutex;

/// Nullable "most recent peer" reference, distinct from any tracked set.
///
/// The slot remembers which owner id stored the current value so that a
/// stale disconnect cannot clobber a newer occupant: `clear_if` only
/// empties the slot when the caller still owns it.
#[derive(Debug, Default)]
pub struct Slot<T> {
    inner: Mutex<Option<(u64, T)>>,
}

impl<T: Clone> Slot<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Installs `value` as the current occupant, replacing any previous one.
    pub fn set(&self, owner: u64, value: T) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *inner = Some((owner, value));
    }

    /// Clears the slot only if `owner` still occupies it. Returns whether
    /// anything was cleared. Idempotent.
    pub fn clear_if(&self, owner: u64) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match *inner {
            Some((current, _)) if current == owner => {
                *inner = None;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self) -> Option<T> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|(_, value)| value.clone())
    }

    pub fn owner(&self) -> Option<u64> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|(owner, _)| *owner)
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }
}
