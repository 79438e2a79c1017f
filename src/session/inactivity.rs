//! Inactivity deadline monitoring.
//!
//! A resettable deadline timer bound to one pairing session. Activity
//! signal sources are injected at construction, each with an attach/detach
//! pair, so the monitor owns no ambient global state. Any signal resets
//! the deadline; at most one deadline is pending per monitor at any time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Callback invoked when the idle window elapses with no reset.
pub type ExpireCallback = Arc<dyn Fn() + Send + Sync>;

/// A source of user-activity notifications (pointer movement, key press,
/// page load, ...).
///
/// Implementations own the underlying hook. The monitor attaches on arm
/// and detaches on disarm or expiry.
pub trait ActivitySignal: Send + Sync {
    /// Begin forwarding activity to `notify`.
    fn attach(&self, notify: Arc<dyn Fn() + Send + Sync>);

    /// Stop forwarding and release the hook. Idempotent.
    fn detach(&self);
}

struct MonitorInner {
    /// Bumped on every arm/reset/disarm; a sleeping task only fires if
    /// its epoch is still current, so cancelled deadlines never go off.
    epoch: u64,
    pending: Option<JoinHandle<()>>,
    on_expire: Option<ExpireCallback>,
    attached: bool,
}

/// Resettable idle-deadline timer.
///
/// Cheap to clone; clones share the same deadline state.
#[derive(Clone)]
pub struct InactivityMonitor {
    window: Duration,
    signals: Arc<Vec<Arc<dyn ActivitySignal>>>,
    inner: Arc<Mutex<MonitorInner>>,
}

impl InactivityMonitor {
    pub fn new(window: Duration, signals: Vec<Arc<dyn ActivitySignal>>) -> Self {
        Self {
            window,
            signals: Arc::new(signals),
            inner: Arc::new(Mutex::new(MonitorInner {
                epoch: 0,
                pending: None,
                on_expire: None,
                attached: false,
            })),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Arm (or re-arm) the deadline one window from now.
    ///
    /// Cancels any previously pending deadline first and attaches the
    /// activity signals so that activity calls [`InactivityMonitor::reset`].
    pub fn arm(&self, on_expire: impl Fn() + Send + Sync + 'static) {
        let attach_signals = {
            let mut inner = self.inner.lock().expect("monitor lock poisoned");
            inner.on_expire = Some(Arc::new(on_expire));
            !std::mem::replace(&mut inner.attached, true)
        };

        if attach_signals {
            for signal in self.signals.iter() {
                let monitor = self.clone();
                signal.attach(Arc::new(move || monitor.reset()));
            }
        }

        self.schedule();
        tracing::debug!(window_secs = self.window.as_secs(), "Inactivity watch armed");
    }

    /// Push the deadline out by a full window.
    ///
    /// Callable at arbitrary frequency; the previous deadline is replaced,
    /// never stacked. No-op when the monitor is not armed.
    pub fn reset(&self) {
        let armed = {
            let inner = self.inner.lock().expect("monitor lock poisoned");
            inner.on_expire.is_some()
        };
        if armed {
            self.schedule();
        }
    }

    /// Cancel the pending deadline and detach the activity signals.
    /// Idempotent.
    pub fn disarm(&self) {
        let was_attached = {
            let mut inner = self.inner.lock().expect("monitor lock poisoned");
            inner.epoch += 1;
            if let Some(task) = inner.pending.take() {
                task.abort();
            }
            inner.on_expire = None;
            std::mem::take(&mut inner.attached)
        };

        if was_attached {
            for signal in self.signals.iter() {
                signal.detach();
            }
            tracing::debug!("Inactivity watch disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        let inner = self.inner.lock().expect("monitor lock poisoned");
        inner.on_expire.is_some()
    }

    fn schedule(&self) {
        let mut inner = self.inner.lock().expect("monitor lock poisoned");
        if inner.on_expire.is_none() {
            return;
        }
        inner.epoch += 1;
        let epoch = inner.epoch;
        if let Some(task) = inner.pending.take() {
            task.abort();
        }

        let monitor = self.clone();
        let window = self.window;
        inner.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            monitor.fire(epoch);
        }));
    }

    fn fire(&self, epoch: u64) {
        let (callback, was_attached) = {
            let mut inner = self.inner.lock().expect("monitor lock poisoned");
            if inner.epoch != epoch {
                // Superseded by a reset or disarm that raced the wakeup.
                return;
            }
            inner.epoch += 1;
            inner.pending = None;
            (inner.on_expire.take(), std::mem::take(&mut inner.attached))
        };

        // Teardown first: the expiry callback must not be re-triggered by
        // activity arriving while it runs.
        if was_attached {
            for signal in self.signals.iter() {
                signal.detach();
            }
        }

        if let Some(callback) = callback {
            tracing::info!(
                window_secs = self.window.as_secs(),
                "Inactivity window elapsed"
            );
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Let spawned deadline tasks run to completion on the paused clock.
    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    fn counting_monitor(window: Duration) -> (InactivityMonitor, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let monitor = InactivityMonitor::new(window, Vec::new());
        let count = Arc::clone(&fired);
        monitor.arm(move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        (monitor, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_once_after_window() {
        let window = Duration::from_secs(600);
        let (monitor, fired) = counting_monitor(window);

        tokio::time::advance(window - Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!monitor.is_armed());

        // Nothing further fires once expired.
        tokio::time::advance(window * 3).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_resets_leave_one_pending_deadline() {
        let window = Duration::from_secs(600);
        let (monitor, fired) = counting_monitor(window);

        // Many resets in quick succession, then repeated half-window
        // resets: no expiry while activity keeps arriving.
        for _ in 0..100 {
            monitor.reset();
        }
        for _ in 0..5 {
            tokio::time::advance(window / 2).await;
            settle().await;
            assert_eq!(fired.load(Ordering::SeqCst), 0);
            monitor.reset();
        }

        // One full quiet window later, exactly one expiry.
        tokio::time::advance(window).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_cancels_and_is_idempotent() {
        let window = Duration::from_secs(600);
        let (monitor, fired) = counting_monitor(window);

        monitor.disarm();
        monitor.disarm();
        assert!(!monitor.is_armed());

        tokio::time::advance(window * 2).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // Reset after disarm stays a no-op.
        monitor.reset();
        tokio::time::advance(window * 2).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_after_expiry() {
        let window = Duration::from_secs(600);
        let (monitor, fired) = counting_monitor(window);

        tokio::time::advance(window).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let count = Arc::clone(&fired);
        monitor.arm(move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert!(monitor.is_armed());

        tokio::time::advance(window).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[derive(Default)]
    struct TestSignal {
        notify: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
        detached: AtomicUsize,
    }

    impl TestSignal {
        fn trigger(&self) {
            let notify = self.notify.lock().unwrap().clone();
            if let Some(notify) = notify {
                notify();
            }
        }

        fn is_attached(&self) -> bool {
            self.notify.lock().unwrap().is_some()
        }
    }

    impl ActivitySignal for TestSignal {
        fn attach(&self, notify: Arc<dyn Fn() + Send + Sync>) {
            *self.notify.lock().unwrap() = Some(notify);
        }

        fn detach(&self) {
            self.notify.lock().unwrap().take();
            self.detached.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_signal_resets_deadline() {
        let window = Duration::from_secs(600);
        let signal = Arc::new(TestSignal::default());
        let monitor = InactivityMonitor::new(window, vec![signal.clone() as Arc<dyn ActivitySignal>]);

        let fired = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&fired);
        monitor.arm(move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert!(signal.is_attached());

        // Activity just before the deadline pushes it out a full window.
        tokio::time::advance(window - Duration::from_secs(1)).await;
        settle().await;
        signal.trigger();
        tokio::time::advance(window - Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Expiry released the hook.
        assert!(!signal.is_attached());
        assert_eq!(signal.detached.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_detaches_signals() {
        let window = Duration::from_secs(600);
        let signal = Arc::new(TestSignal::default());
        let monitor = InactivityMonitor::new(window, vec![signal.clone() as Arc<dyn ActivitySignal>]);

        monitor.arm(|| {});
        assert!(signal.is_attached());

        monitor.disarm();
        assert!(!signal.is_attached());
        assert_eq!(signal.detached.load(Ordering::SeqCst), 1);

        // Idempotent disarm does not detach twice.
        monitor.disarm();
        assert_eq!(signal.detached.load(Ordering::SeqCst), 1);
    }
}
