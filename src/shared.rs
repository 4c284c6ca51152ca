use std::sync::{Arc, PoisonError, RwLock};

/// Holds the latest value of some shared state.
///
/// Readers take an `Arc` snapshot and keep using it for the whole computation;
/// writers swap in a new value. Readers only hold the lock for the pointer
/// copy, so a reader never observes a half-updated value.
#[derive(Debug)]
pub struct Latest<T> {
    current: RwLock<Arc<T>>,
}

impl<T> Latest<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
        }
    }

    pub fn load(&self) -> Arc<T> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in `value`, returning the snapshot it replaced.
    pub fn replace(&self, value: T) -> Arc<T> {
        let next = Arc::new(value);
        let mut locked = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *locked, next)
    }

    /// Derive the next value from the current one under the write lock, so
    /// concurrent updates apply in turn instead of overwriting each other.
    /// The value is left unchanged when `f` fails.
    pub fn update<E>(&self, f: impl FnOnce(&T) -> Result<T, E>) -> Result<Arc<T>, E> {
        let mut locked = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(f(&**locked)?);
        *locked = next.clone();
        Ok(next)
    }
}

impl<T: Default> Default for Latest<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn readers_keep_their_snapshot_across_replace() {
        let latest = Latest::new(vec![1, 2, 3]);
        let before = latest.load();
        let previous = latest.replace(vec![4, 5, 6]);

        assert_eq!(*before, vec![1, 2, 3]);
        assert!(Arc::ptr_eq(&before, &previous));
        assert_eq!(*latest.load(), vec![4, 5, 6]);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let latest = Arc::new(Latest::new(0u32));
        let writers: Vec<_> = (0..8)
            .map(|_| {
                let latest = latest.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        latest.update(|n| Ok::<_, ()>(n + 1)).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(*latest.load(), 4000);

        assert_eq!(latest.update(|_| Err("rejected")), Err("rejected"));
        assert_eq!(*latest.load(), 4000);
    }

    #[test]
    fn concurrent_readers_see_whole_values() {
        let latest = Arc::new(Latest::new((0u64, 0u64)));

        let writer = {
            let latest = latest.clone();
            thread::spawn(move || {
                for i in 1..=1000u64 {
                    latest.replace((i, i * 2));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let latest = latest.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let snapshot = latest.load();
                        assert_eq!(snapshot.1, snapshot.0 * 2);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(*latest.load(), (1000, 2000));
    }
}
