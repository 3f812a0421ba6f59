use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use tracing::error;

pub const TICKS_PER_SECOND: u32 = 30;
/// Upper bound on update catch-up per frame, in ticks.
pub const TICKS_PER_FRAME: u32 = 4;

pub type Handler = Box<dyn FnMut(Duration)>;

/// Two-clock driver: the host calls [`Scheduler::frame`] on every display
/// refresh; updates run at a fixed timestep with bounded catch-up.
///
/// A handler that panics is logged and permanently replaced with a no-op;
/// the other handler keeps running.
pub struct Scheduler {
    update: Option<Handler>,
    render: Option<Handler>,
    update_delay: Duration,
    update_limit: Duration,
    last_update: Instant,
    last_render: Instant,
}

impl Scheduler {
    pub fn new(update: Handler, render: Handler) -> Self {
        Self::with_start(update, render, Instant::now())
    }

    pub fn with_start(update: Handler, render: Handler, start: Instant) -> Self {
        let update_delay = Duration::from_secs(1) / TICKS_PER_SECOND;
        Self {
            update: Some(update),
            render: Some(render),
            update_delay,
            update_limit: update_delay * TICKS_PER_FRAME,
            last_update: start,
            last_render: start,
        }
    }

    pub fn frame(&mut self, now: Instant) {
        self.advance_updates(now);

        let dt = now.saturating_duration_since(self.last_render);
        self.last_render = now;
        Self::run_guarded(&mut self.render, "render", dt);
    }

    fn advance_updates(&mut self, now: Instant) {
        let mut elapsed = now.saturating_duration_since(self.last_update);
        if elapsed > self.update_limit {
            // Drop backlog beyond the catch-up budget instead of spiraling.
            self.last_update = now - self.update_limit;
            elapsed = self.update_limit;
        }

        while elapsed >= self.update_delay {
            Self::run_guarded(&mut self.update, "update", self.update_delay);
            self.last_update += self.update_delay;
            elapsed -= self.update_delay;
        }
    }

    fn run_guarded(slot: &mut Option<Handler>, name: &'static str, dt: Duration) {
        let Some(mut handler) = slot.take() else {
            return;
        };
        match catch_unwind(AssertUnwindSafe(|| handler(dt))) {
            Ok(()) => *slot = Some(handler),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(handler = name, message, "handler panicked; disabling it");
            }
        }
    }
}
