use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Pending,
    Ready,
    TimedOut,
}

/// Per-frame poll for a dependency that may come up after its dependent.
/// Never blocks: the owner calls `poll` once per frame with the current availability.
#[derive(Debug, Clone)]
pub struct DependencyWait {
    dependency: &'static str,
    timeout_seconds: Option<f32>,
    elapsed_seconds: f32,
    warned: bool,
}

impl DependencyWait {
    pub fn new(dependency: &'static str, timeout_seconds: Option<f32>) -> Self {
        Self {
            dependency,
            timeout_seconds,
            elapsed_seconds: 0.0,
            warned: false,
        }
    }

    pub fn poll(&mut self, dt_seconds: f32, available: bool) -> WaitStatus {
        if available {
            return WaitStatus::Ready;
        }
        self.elapsed_seconds += dt_seconds.max(0.0);
        match self.timeout_seconds {
            Some(timeout) if self.elapsed_seconds >= timeout => {
                if !self.warned {
                    self.warned = true;
                    warn!(
                        dependency = self.dependency,
                        waited_seconds = self.elapsed_seconds,
                        "dependency_wait_timed_out"
                    );
                }
                WaitStatus::TimedOut
            }
            _ => WaitStatus::Pending,
        }
    }

    pub fn reset(&mut self) {
        self.elapsed_seconds = 0.0;
        self.warned = false;
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_as_soon_as_dependency_exists() {
        let mut wait = DependencyWait::new("turn_pipeline", Some(2.0));
        assert_eq!(wait.poll(0.5, false), WaitStatus::Pending);
        assert_eq!(wait.poll(0.5, true), WaitStatus::Ready);
    }

    #[test]
    fn times_out_after_budget() {
        let mut wait = DependencyWait::new("turn_pipeline", Some(1.0));
        assert_eq!(wait.poll(0.6, false), WaitStatus::Pending);
        assert_eq!(wait.poll(0.6, false), WaitStatus::TimedOut);
        assert_eq!(wait.poll(0.6, true), WaitStatus::Ready);
    }

    #[test]
    fn without_timeout_stays_pending() {
        let mut wait = DependencyWait::new("hud", None);
        for _ in 0..100 {
            assert_eq!(wait.poll(1.0, false), WaitStatus::Pending);
        }
        wait.reset();
        assert_eq!(wait.elapsed_seconds(), 0.0);
    }
}
