//! Toast queue: short non-blocking messages shown one at a time.
//!
//! [`ToastQueue`] is a plain state machine over the unscaled clock. It does not
//! own the overlay; each tick returns the [`ToastStep`]s the session applies to
//! the toast channel, which keeps the queue testable without any screens.

use std::any::Any;
use std::collections::VecDeque;
use std::time::Duration;

use crate::core::config::ToastConfig;
use crate::screen::Screen;

/// Fade and hold timings, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToastTiming {
    /// Seconds to fade in.
    pub fade_in: f64,
    /// Seconds to fade out.
    pub fade_out: f64,
    /// Shortest hold, applied to explicit durations.
    pub min_hold: f64,
    /// Hold used when a toast gives none.
    pub default_hold: f64,
}

impl Default for ToastTiming {
    fn default() -> Self {
        Self::from(&ToastConfig::default())
    }
}

impl From<&ToastConfig> for ToastTiming {
    fn from(cfg: &ToastConfig) -> Self {
        Self {
            fade_in: cfg.fade_in_secs.max(0.0),
            fade_out: cfg.fade_out_secs.max(0.0),
            min_hold: cfg.min_hold_secs.max(0.0),
            default_hold: cfg.default_hold_secs.max(0.0),
        }
    }
}

/// Instruction for whoever renders the toast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ToastStep {
    /// Show a fresh toast view with this message at alpha 0.
    Show {
        /// Text to display.
        message: String,
    },
    /// Set the visible toast's opacity.
    Alpha(f32),
    /// Remove the toast view.
    Hide,
}

#[derive(Debug, Clone)]
struct Item {
    message: String,
    hold: f64,
}

#[derive(Debug)]
struct Showing {
    item: Item,
    elapsed: f64,
}

/// FIFO of pending toasts plus the one on screen.
#[derive(Debug)]
pub struct ToastQueue {
    timing: ToastTiming,
    queue: VecDeque<Item>,
    current: Option<Showing>,
}

impl ToastQueue {
    /// Idle queue with the given timings.
    #[must_use]
    pub fn new(timing: ToastTiming) -> Self {
        Self {
            timing,
            queue: VecDeque::new(),
            current: None,
        }
    }

    /// Enqueue a message. Blank messages are ignored and return `false`.
    /// The hold never drops below the configured minimum.
    pub fn push(&mut self, message: &str, hold_secs: Option<f64>) -> bool {
        if message.trim().is_empty() {
            return false;
        }
        let requested = hold_secs
            .filter(|s| s.is_finite())
            .unwrap_or(self.timing.default_hold);
        self.queue.push_back(Item {
            message: message.to_string(),
            hold: requested.max(self.timing.min_hold),
        });
        true
    }

    /// Advance by `dt` of unscaled time.
    ///
    /// An idle queue starts its next message without consuming `dt`; the
    /// timeline runs fade-in, hold, then fade-out, after which the view is
    /// hidden and the next message (if any) starts immediately.
    pub fn tick(&mut self, dt: Duration) -> Vec<ToastStep> {
        let mut steps = Vec::new();
        let Some(showing) = self.current.as_mut() else {
            self.start_next(&mut steps);
            return steps;
        };

        showing.elapsed += dt.as_secs_f64();
        let t = &self.timing;
        let fade_in_end = t.fade_in;
        let hold_end = fade_in_end + showing.item.hold;
        let fade_out_end = hold_end + t.fade_out;
        let elapsed = showing.elapsed;

        if elapsed > fade_out_end {
            self.current = None;
            steps.push(ToastStep::Hide);
            self.start_next(&mut steps);
            return steps;
        }

        let alpha = if elapsed <= fade_in_end {
            ratio(elapsed, t.fade_in)
        } else if elapsed <= hold_end {
            1.0
        } else {
            1.0 - ratio(elapsed - hold_end, t.fade_out)
        };
        #[allow(clippy::cast_possible_truncation)]
        steps.push(ToastStep::Alpha(alpha.clamp(0.0, 1.0) as f32));
        steps
    }

    /// Drop every queued message and the one showing. Returns whether a toast
    /// was visible, i.e. whether the caller has a view to hide.
    pub fn clear(&mut self) -> bool {
        self.queue.clear();
        self.current.take().is_some()
    }

    /// Drop the visible toast only; queued messages resume on the next tick.
    pub fn interrupt(&mut self) -> bool {
        self.current.take().is_some()
    }

    /// A toast is on screen.
    #[must_use]
    pub fn is_showing(&self) -> bool {
        self.current.is_some()
    }

    /// Messages waiting behind the visible one.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Message of the toast on screen.
    #[must_use]
    pub fn current_message(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.item.message.as_str())
    }

    /// Timings in use.
    #[must_use]
    pub fn timing(&self) -> ToastTiming {
        self.timing
    }

    fn start_next(&mut self, steps: &mut Vec<ToastStep>) {
        if let Some(item) = self.queue.pop_front() {
            steps.push(ToastStep::Show {
                message: item.message.clone(),
            });
            steps.push(ToastStep::Alpha(0.0));
            self.current = Some(Showing { item, elapsed: 0.0 });
        }
    }
}

fn ratio(elapsed: f64, span: f64) -> f64 {
    if span <= 0.0 { 1.0 } else { elapsed / span }
}

/// The rendered toast on the toast overlay channel.
#[derive(Debug, Clone, Default)]
pub struct ToastView {
    message: String,
    alpha: f32,
}

impl ToastView {
    /// Toast view for `message`, fully transparent.
    #[must_use]
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            alpha: 0.0,
        }
    }

    /// Displayed text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Current opacity.
    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Set the opacity, clamped to `0.0..=1.0`.
    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }
}

impl Screen for ToastView {
    fn kind(&self) -> &'static str {
        "toast"
    }

    fn status(&self) -> String {
        format!("{} (alpha {:.2})", self.message, self.alpha)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
