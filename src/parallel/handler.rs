use anyhow::Error;

/// Central hook for failures raised while executing units of work.
///
/// The engine calls `handle` on the calling thread before returning the
/// failure to its caller, so implementations only classify and report.
pub trait FailureHandler: Send + Sync {
    fn handle(&self, error: &Error);
}

impl<F> FailureHandler for F
where
    F: Fn(&Error) + Send + Sync,
{
    fn handle(&self, error: &Error) {
        self(error)
    }
}

/// Default handler: reports every failure through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingFailureHandler;

impl FailureHandler for LoggingFailureHandler {
    fn handle(&self, error: &Error) {
        tracing::error!("Execution failed: {:#}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_handler_sees_error() {
        let seen = Mutex::new(Vec::new());
        let handler = |error: &Error| seen.lock().unwrap().push(error.to_string());

        handler.handle(&anyhow::anyhow!("shard 3 unreachable"));

        assert_eq!(*seen.lock().unwrap(), vec!["shard 3 unreachable".to_string()]);
    }

    #[test]
    fn test_logging_handler_does_not_panic() {
        LoggingFailureHandler.handle(&anyhow::anyhow!("boom").context("while merging"));
    }
}
