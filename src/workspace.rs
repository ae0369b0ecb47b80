//! Exclusive access to the engine's scan scratch.
//!
//! There is exactly one scratch per compiled database and every scan needs
//! it mutably, so scans are serialized: one in flight at a time no matter
//! how many requests are waiting.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Owns the single scan scratch and hands out exclusive handles to it.
///
/// # Examples
///
/// ```rust
/// use ladon::Workspace;
///
/// let workspace = Workspace::new(Vec::<u8>::new());
/// {
///     let mut handle = workspace.acquire();
///     handle.push(1);
/// }
/// assert_eq!(workspace.acquisitions(), 1);
/// assert_eq!(workspace.releases(), 1);
/// ```
#[derive(Debug)]
pub struct Workspace<S> {
    scratch: Mutex<S>,
    acquisitions: AtomicU64,
    releases: AtomicU64,
}

impl<S> Workspace<S> {
    pub fn new(scratch: S) -> Self {
        Self {
            scratch: Mutex::new(scratch),
            acquisitions: AtomicU64::new(0),
            releases: AtomicU64::new(0),
        }
    }

    /// Block until the scratch is free, then take it.
    ///
    /// The returned handle releases the scratch when dropped, on every exit
    /// path. A scratch left behind by a panicking holder is handed out
    /// anyway; engines reset it at the start of each scan.
    pub fn acquire(&self) -> WorkspaceHandle<'_, S> {
        let guard = self.scratch.lock().unwrap_or_else(|poisoned| {
            warn!("Workspace lock poisoned by a panicked scan, recovering");
            poisoned.into_inner()
        });

        self.acquisitions.fetch_add(1, Ordering::SeqCst);

        WorkspaceHandle {
            guard,
            workspace: self,
        }
    }

    /// Total number of successful acquisitions.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Total number of releases.
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::SeqCst)
    }

    /// Whether a handle is currently outstanding.
    pub fn is_held(&self) -> bool {
        self.acquisitions() > self.releases()
    }

    pub fn into_inner(self) -> S {
        self.scratch
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Exclusive access to the scratch for the lifetime of the handle.
pub struct WorkspaceHandle<'a, S> {
    guard: MutexGuard<'a, S>,
    workspace: &'a Workspace<S>,
}

impl<S> Deref for WorkspaceHandle<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.guard
    }
}

impl<S> DerefMut for WorkspaceHandle<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.guard
    }
}

impl<S> Drop for WorkspaceHandle<'_, S> {
    fn drop(&mut self) {
        // Counted before the guard drops, so the next holder sees it.
        self.workspace.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_release_counts() {
        let workspace = Workspace::new(0u32);

        for _ in 0..3 {
            let mut handle = workspace.acquire();
            assert!(workspace.is_held());
            *handle += 1;
        }

        assert!(!workspace.is_held());
        assert_eq!(workspace.acquisitions(), 3);
        assert_eq!(workspace.releases(), 3);
        assert_eq!(workspace.into_inner(), 3);
    }

    #[test]
    fn test_mutual_exclusion_across_threads() {
        let workspace = Arc::new(Workspace::new(Vec::<usize>::new()));
        // Tracked outside the lock so overlapping holders would show up.
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);

        thread::scope(|scope| {
            for worker in 0..8 {
                let workspace = Arc::clone(&workspace);
                let (inside, max_inside) = (&inside, &max_inside);
                scope.spawn(move || {
                    for _ in 0..50 {
                        let mut handle = workspace.acquire();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);

                        handle.push(worker);
                        let len = handle.len();
                        thread::yield_now();
                        assert_eq!(handle.len(), len);

                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(workspace.acquisitions(), 400);
        assert_eq!(workspace.releases(), 400);
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(!workspace.is_held());
    }

    #[test]
    fn test_recovers_after_panicking_holder() {
        let workspace = Arc::new(Workspace::new(0u32));

        let panicking = Arc::clone(&workspace);
        let result = thread::spawn(move || {
            let _handle = panicking.acquire();
            panic!("scan blew up");
        })
        .join();
        assert!(result.is_err());

        let handle = workspace.acquire();
        assert_eq!(*handle, 0);
        drop(handle);
        assert_eq!(workspace.releases(), 2);
    }
}
