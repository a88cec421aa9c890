use crate::config::LabelConfig;

/// Decides when label placement may be recomputed: at most once per throttle window,
/// and not at all while a zoom gesture is still moving.
#[derive(Clone, Debug)]
pub struct LabelScheduler {
    throttle_secs: f64,
    settle_secs: f64,
    last_run: Option<f64>,
    last_zoom_input: Option<f64>,
    dirty: bool,
}

impl LabelScheduler {
    pub fn new(config: &LabelConfig) -> Self {
        Self {
            throttle_secs: config.throttle_secs.max(0.0),
            settle_secs: config.zoom_settle_secs.max(0.0),
            last_run: None,
            last_zoom_input: None,
            dirty: true,
        }
    }

    pub fn set_config(&mut self, config: &LabelConfig) {
        self.throttle_secs = config.throttle_secs.max(0.0);
        self.settle_secs = config.zoom_settle_secs.max(0.0);
        self.dirty = true;
    }

    /// Something that moves labels changed (pan, data, highlight).
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn note_zoom_gesture(&mut self, now: f64) {
        self.last_zoom_input = Some(now);
        self.dirty = true;
    }

    pub fn is_suspended(&self, now: f64) -> bool {
        self.last_zoom_input
            .is_some_and(|at| now - at < self.settle_secs)
    }

    pub fn should_run(&self, now: f64) -> bool {
        self.dirty
            && !self.is_suspended(now)
            && self
                .last_run
                .is_none_or(|at| now - at >= self.throttle_secs)
    }

    pub fn mark_ran(&mut self, now: f64) {
        self.last_run = Some(now);
        self.dirty = false;
    }

    /// Seconds until a pending recompute becomes possible, if one is pending.
    pub fn next_wakeup(&self, now: f64) -> Option<f64> {
        if !self.dirty {
            return None;
        }
        let throttle = self
            .last_run
            .map_or(0.0, |at| (at + self.throttle_secs - now).max(0.0));
        let settle = self
            .last_zoom_input
            .map_or(0.0, |at| (at + self.settle_secs - now).max(0.0));
        Some(throttle.max(settle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_most_five_recomputes_per_second() {
        let mut scheduler = LabelScheduler::new(&LabelConfig::default());
        let mut runs = 0;
        let mut now = 0.0;
        while now < 1.0 {
            scheduler.invalidate();
            if scheduler.should_run(now) {
                scheduler.mark_ran(now);
                runs += 1;
            }
            now += 1.0 / 120.0;
        }
        assert!(runs <= 5, "{runs} recomputes in one second");
        assert!(runs >= 4);
    }

    #[test]
    fn zoom_gesture_suspends_until_settled() {
        let mut scheduler = LabelScheduler::new(&LabelConfig::default());
        scheduler.note_zoom_gesture(10.0);
        assert!(scheduler.is_suspended(10.1));
        assert!(!scheduler.should_run(10.1));
        assert!(!scheduler.is_suspended(10.2));
        assert!(scheduler.should_run(10.2));
    }

    #[test]
    fn clean_scheduler_does_not_run() {
        let mut scheduler = LabelScheduler::new(&LabelConfig::default());
        scheduler.mark_ran(0.0);
        assert!(!scheduler.should_run(5.0));
        assert_eq!(scheduler.next_wakeup(5.0), None);
        scheduler.invalidate();
        let wait = scheduler.next_wakeup(0.05).expect("recompute pending");
        assert!((wait - 0.15).abs() < 1e-9);
    }
}
