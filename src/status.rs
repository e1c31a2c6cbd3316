use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Progress token handed to status callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
    Timeout,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
            TxStatus::Timeout => "timeout",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback that ignores every status.
pub fn ignore_status(_status: TxStatus) {}

/// Forwards statuses to a caller callback in lifecycle order.
///
/// A status is forwarded at most once, and nothing is forwarded after a terminal status.
pub struct StatusReporter<'a> {
    callback: &'a (dyn Fn(TxStatus) + Send + Sync),
    last: Mutex<Option<TxStatus>>,
}

impl<'a> StatusReporter<'a> {
    pub fn new(callback: &'a (dyn Fn(TxStatus) + Send + Sync)) -> Self {
        Self {
            callback,
            last: Mutex::new(None),
        }
    }

    /// Returns `true` if the status was forwarded.
    pub fn report(&self, status: TxStatus) -> bool {
        {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            match *last {
                Some(prev) if prev.is_terminal() || prev == status => return false,
                _ => *last = Some(status),
            }
        }
        (self.callback)(status);
        true
    }

    pub fn last(&self) -> Option<TxStatus> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens() {
        assert_eq!(TxStatus::Pending.as_str(), "pending");
        assert_eq!(TxStatus::Timeout.to_string(), "timeout");
        assert_eq!(
            serde_json::to_string(&TxStatus::Confirmed).unwrap(),
            "\"confirmed\""
        );
    }

    #[test]
    fn test_reporter_forwards_in_order_once() {
        let seen = Mutex::new(Vec::new());
        let callback = |s: TxStatus| seen.lock().unwrap().push(s);
        let reporter = StatusReporter::new(&callback);

        assert!(reporter.report(TxStatus::Pending));
        assert!(!reporter.report(TxStatus::Pending));
        assert!(reporter.report(TxStatus::Confirmed));
        assert!(!reporter.report(TxStatus::Failed));
        assert!(!reporter.report(TxStatus::Confirmed));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![TxStatus::Pending, TxStatus::Confirmed]
        );
        assert_eq!(reporter.last(), Some(TxStatus::Confirmed));
    }

    #[test]
    fn test_terminal_without_pending() {
        let seen = Mutex::new(Vec::new());
        let callback = |s: TxStatus| seen.lock().unwrap().push(s);
        let reporter = StatusReporter::new(&callback);

        assert!(reporter.report(TxStatus::Failed));
        assert!(!reporter.report(TxStatus::Pending));
        assert_eq!(*seen.lock().unwrap(), vec![TxStatus::Failed]);
    }
}
