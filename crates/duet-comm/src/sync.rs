//! Small async synchronization primitives shared across the engine.
//!
//! These are the async renditions of the condition-variable-and-flag pattern
//! the protocol layers use for publication: a value (or completion) is set
//! exactly once and awaited by any number of fibers.

use std::{
    pin::pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use tokio::sync::Notify;

/// A write-once cell whose readers can await the value.
#[derive(Debug, Default)]
pub struct SetOnce<T> {
    value: Mutex<Option<T>>,
    notify: Notify,
}

impl<T: Clone> SetOnce<T> {
    /// Creates an empty cell.
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Publishes the value, waking all waiters.
    ///
    /// # Panics
    ///
    /// Panics if the cell was already set; a value is published exactly once.
    pub fn set(&self, value: T) {
        let mut guard = self.value.lock().unwrap();
        assert!(guard.is_none(), "value published twice");
        *guard = Some(value);
        drop(guard);
        self.notify.notify_waiters();
    }

    /// Returns the value if it has been published.
    pub fn get(&self) -> Option<T> {
        self.value.lock().unwrap().clone()
    }

    /// Waits until the value is published and returns a clone of it.
    pub async fn wait(&self) -> T {
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            if let Some(value) = self.get() {
                return value;
            }
            notified.await;
        }
    }
}

/// A completion flag: set once, awaited by many.
#[derive(Debug, Default)]
pub struct Completion {
    done: AtomicBool,
    notify: Notify,
}

impl Completion {
    /// Creates an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the flag has been set.
    pub fn is_set(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Sets the flag, waking all waiters.
    pub fn set(&self) {
        self.done.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Waits until the flag is set.
    pub async fn wait(&self) {
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;

    #[tokio::test]
    async fn test_set_once_wakes_waiter() {
        let cell = Arc::new(SetOnce::new());
        let waiter = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move { cell.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cell.set(7u32);
        assert_eq!(waiter.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_set_before_wait() {
        let cell = SetOnce::new();
        cell.set("x");
        assert_eq!(cell.wait().await, "x");
    }

    #[test]
    #[should_panic(expected = "published twice")]
    fn test_double_set_panics() {
        let cell = SetOnce::new();
        cell.set(1);
        cell.set(2);
    }

    #[tokio::test]
    async fn test_completion() {
        let flag = Arc::new(Completion::new());
        assert!(!flag.is_set());
        let waiter = {
            let flag = Arc::clone(&flag);
            tokio::spawn(async move { flag.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        flag.set();
        waiter.await.unwrap();
        assert!(flag.is_set());
    }
}
