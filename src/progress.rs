use smallworld_core::ProgressReporter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Logs build progress at every 10 % of a batch.
#[derive(Debug)]
pub struct LogProgress {
    label: String,
    started: Instant,
    last_decile: AtomicUsize,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            started: Instant::now(),
            last_decile: AtomicUsize::new(0),
        }
    }

    /// Decile (1..=10) that `current` completes, if it is the first item to reach it.
    fn crossed_decile(&self, current: usize, total: usize) -> Option<usize> {
        if total == 0 {
            return None;
        }
        let decile = (current + 1) * 10 / total;
        let previous = self.last_decile.fetch_max(decile, Ordering::Relaxed);
        (decile > previous).then_some(decile)
    }
}

impl ProgressReporter for LogProgress {
    fn progress(&self, current: usize, total: usize) {
        if let Some(decile) = self.crossed_decile(current, total) {
            tracing::info!(
                label = %self.label,
                done = current + 1,
                total,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "{}% built",
                decile * 10
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_each_decile_once() {
        let p = LogProgress::new("test");
        let crossed: Vec<usize> = (0..100).filter_map(|i| p.crossed_decile(i, 100)).collect();
        assert_eq!(crossed, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_small_batches() {
        let p = LogProgress::new("small");
        let crossed: Vec<usize> = (0..3).filter_map(|i| p.crossed_decile(i, 3)).collect();
        assert_eq!(crossed, vec![3, 6, 10]);
        assert_eq!(LogProgress::new("empty").crossed_decile(0, 0), None);
    }
}
