//! Overlay strobe
//!
//! Periodically flips overlay visibility. Visibility is published over a
//! watch channel so the desktop shell can forward changes to the webview.

use crate::utils::task::ScheduledTask;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const MIN_STROBE_INTERVAL_MS: u64 = 500;
pub const MAX_STROBE_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_STROBE_INTERVAL_MS: u64 = 1000;

pub fn clamp_interval_ms(ms: u64) -> u64 {
    ms.clamp(MIN_STROBE_INTERVAL_MS, MAX_STROBE_INTERVAL_MS)
}

pub struct Strobe {
    interval_ms: u64,
    visible: watch::Sender<bool>,
    timer: Option<StrobeTimer>,
}

struct StrobeTimer {
    task: ScheduledTask,
    /// Cleared before the task is cancelled so an in-flight tick cannot flip
    /// visibility after it has been forced back on
    armed: Arc<AtomicBool>,
}

impl Strobe {
    pub fn new(interval_ms: u64) -> Self {
        let (visible, _) = watch::channel(true);
        Self {
            interval_ms: clamp_interval_ms(interval_ms),
            visible,
            timer: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.timer.is_some()
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn is_visible(&self) -> bool {
        *self.visible.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.visible.subscribe()
    }

    /// Whether a strobe timer is currently scheduled
    pub fn has_active_timer(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| t.task.is_active())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            if self.timer.is_none() {
                self.arm();
                tracing::debug!("Strobe enabled ({}ms)", self.interval_ms);
            }
        } else {
            self.disarm();
            tracing::debug!("Strobe disabled");
        }
    }

    /// Change the period; a running strobe restarts with the new period
    pub fn set_interval_ms(&mut self, ms: u64) -> u64 {
        self.interval_ms = clamp_interval_ms(ms);
        if self.timer.is_some() {
            self.disarm();
            self.arm();
        }
        self.interval_ms
    }

    fn arm(&mut self) {
        let armed = Arc::new(AtomicBool::new(true));
        let flag = armed.clone();
        let visible = self.visible.clone();

        let task = ScheduledTask::every(
            "overlay-strobe",
            Duration::from_millis(self.interval_ms),
            move || {
                visible.send_if_modified(|v| {
                    if !flag.load(Ordering::SeqCst) {
                        return false;
                    }
                    *v = !*v;
                    true
                });
            },
        );

        self.timer = Some(StrobeTimer { task, armed });
    }

    /// Stop the timer and force the overlay visible
    fn disarm(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.armed.store(false, Ordering::SeqCst);
            timer.task.cancel();
        }
        self.visible.send_replace(true);
    }
}

impl Drop for Strobe {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_enable_then_disable_leaves_visible() {
        let mut strobe = Strobe::new(500);
        strobe.set_enabled(true);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!strobe.is_visible());

        strobe.set_enabled(false);
        assert!(strobe.is_visible());
        assert!(!strobe.has_active_timer());

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert!(strobe.is_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggles_on_period() {
        let mut strobe = Strobe::new(1000);
        let mut rx = strobe.subscribe();
        strobe.set_enabled(true);

        let mut seen = Vec::new();
        for _ in 0..4 {
            rx.changed().await.unwrap();
            seen.push(*rx.borrow_and_update());
        }
        assert_eq!(seen, vec![false, true, false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_toggles_keep_one_timer() {
        let mut strobe = Strobe::new(500);
        for _ in 0..10 {
            strobe.set_enabled(true);
            strobe.set_enabled(true);
            strobe.set_enabled(false);
        }
        assert!(!strobe.has_active_timer());

        strobe.set_enabled(true);
        strobe.set_enabled(true);
        tokio::time::sleep(Duration::from_millis(700)).await;
        // a duplicated timer would have flipped twice by now
        assert!(!strobe.is_visible());
        strobe.set_enabled(false);
        assert!(strobe.is_visible());
    }

    #[test]
    fn test_interval_clamped() {
        let mut strobe = Strobe::new(50);
        assert_eq!(strobe.interval_ms(), 500);
        assert_eq!(strobe.set_interval_ms(10_000), 2000);
        assert_eq!(strobe.set_interval_ms(750), 750);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_restarts_timer() {
        let mut strobe = Strobe::new(2000);
        strobe.set_enabled(true);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(strobe.is_visible());

        strobe.set_interval_ms(500);
        assert!(strobe.is_enabled());
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!strobe.is_visible());
    }
}
