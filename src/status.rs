use tracing::{error, info};

/// Seam for user-facing notifications. The host editor supplies its own
/// implementation; the default routes through the log.
pub trait StatusReporter: Send + Sync {
    /// Transient progress message.
    fn status(&self, message: &str);

    /// Prominent failure the user should see.
    fn error(&self, message: &str);
}

#[derive(Debug, Default)]
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn status(&self, message: &str) {
        info!("{message}");
    }

    fn error(&self, message: &str) {
        error!("{message}");
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::StatusReporter;
    use parking_lot::Mutex;

    /// Collects reported messages for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingReporter {
        pub statuses: Mutex<Vec<String>>,
        pub errors: Mutex<Vec<String>>,
    }

    impl StatusReporter for RecordingReporter {
        fn status(&self, message: &str) {
            self.statuses.lock().push(message.to_string());
        }

        fn error(&self, message: &str) {
            self.errors.lock().push(message.to_string());
        }
    }
}
