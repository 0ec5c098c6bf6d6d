use std::time::Duration;

/// Fixed-delay bounded retry for transient storage contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 8,
            delay: Duration::from_millis(120),
        }
    }
}

/// Outcome of [`RetryPolicy::run`].
#[derive(Debug)]
pub enum Attempt<E> {
    /// The operation eventually succeeded.
    Done { retries: u32 },
    /// Every attempt hit a transient error.
    Exhausted { retries: u32, error: E },
    /// A non-transient error; not retried further.
    Failed { retries: u32, error: E },
}

impl<E> Attempt<E> {
    pub fn retries(&self) -> u32 {
        match self {
            Attempt::Done { retries }
            | Attempt::Exhausted { retries, .. }
            | Attempt::Failed { retries, .. } => *retries,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Attempt::Done { .. })
    }
}

impl RetryPolicy {
    /// Run `op`, sleeping `delay` and trying again while `is_transient` says so,
    /// at most `max_retries` extra times.
    pub fn run<E>(
        &self,
        mut op: impl FnMut() -> Result<(), E>,
        is_transient: impl Fn(&E) -> bool,
    ) -> Attempt<E> {
        let mut retries = 0;
        loop {
            match op() {
                Ok(()) => return Attempt::Done { retries },
                Err(error) if !is_transient(&error) => return Attempt::Failed { retries, error },
                Err(error) if retries >= self.max_retries => {
                    return Attempt::Exhausted { retries, error };
                }
                Err(_) => {
                    retries += 1;
                    tracing::debug!(retries, "transient storage error, retrying");
                    std::thread::sleep(self.delay);
                }
            }
        }
    }
}
