use parking_lot::Mutex;

/// Write-once slot shared by concurrent workers.
///
/// The first `set` wins; later calls are ignored and report `false`.
#[derive(Debug)]
pub struct Latch<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for Latch<T> {
    fn default() -> Self {
        Latch {
            slot: Mutex::new(None),
        }
    }
}

impl<T> Latch<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` if nothing has been stored yet
    pub fn set(&self, value: T) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }

    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Remove the stored value, leaving the latch unset
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn into_inner(self) -> Option<T> {
        self.slot.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_set_wins() {
        let latch = Latch::new();
        assert!(!latch.is_set());
        assert!(latch.set(1));
        assert!(!latch.set(2));
        assert_eq!(latch.take(), Some(1));
        assert!(latch.set(3));
        assert_eq!(latch.into_inner(), Some(3));
    }

    #[test]
    fn test_concurrent_set_exactly_once() {
        let latch = Arc::new(Latch::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let latch = latch.clone();
                std::thread::spawn(move || latch.set(i))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(latch.is_set());
    }
}
