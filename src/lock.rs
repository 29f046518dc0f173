//! Mutex recovery so a panicked background writer cannot wedge the memory store.

use std::sync::{Mutex, MutexGuard};

/// Take the lock, or take over a poisoned one after logging where it happened.
///
/// The store and capture sinks hold plain data behind their mutexes, so the
/// state left by a panicking holder is still structurally valid.
pub(crate) fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        crate::log_debug(&format!("mutex poisoned in {context}; recovering"));
        tracing::warn!(context, "recovered poisoned mutex");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::lock_or_recover;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn healthy_lock_hands_out_a_normal_guard() {
        let turns = Mutex::new(vec!["hello"]);
        lock_or_recover(&turns, "healthy").push("again");
        assert_eq!(*turns.lock().expect("not poisoned"), vec!["hello", "again"]);
    }

    #[test]
    fn poisoned_lock_is_taken_over_with_data_intact() {
        let counter = Arc::new(Mutex::new(41_i64));
        let worker = Arc::clone(&counter);
        let joined = thread::spawn(move || {
            let _guard = worker.lock().expect("first lock");
            panic!("summarizer worker died while holding the store");
        })
        .join();
        assert!(joined.is_err());
        assert!(counter.is_poisoned());

        *lock_or_recover(&counter, "poisoned-counter") += 1;
        let value = counter.lock().unwrap_or_else(|p| p.into_inner());
        assert_eq!(*value, 42);
    }
}
