//! The single in-flight request and its resend deadline.

use std::time::{Duration, Instant};

use crate::message::Request;

/// A request awaiting its response.
///
/// Resending keeps the request unchanged and only moves the deadline, so a
/// late duplicate response merges into the same blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// The request as last sent.
    request: Request,
    /// When it was (re)sent.
    issued_at: Instant,
    /// How many times it was resent.
    resend_count: u32,
}

impl PendingRequest {
    /// Record a freshly issued request.
    pub fn new(request: Request, issued_at: Instant) -> Self {
        Self {
            request,
            issued_at,
            resend_count: 0,
        }
    }

    /// The pending request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// When it was last sent.
    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    /// Number of resends so far.
    pub fn resend_count(&self) -> u32 {
        self.resend_count
    }

    /// Check if more than `timeout` has passed since the last send.
    pub fn is_overdue(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.issued_at) > timeout
    }

    /// Record a resend and return the request to write again.
    pub fn on_resend(&mut self, now: Instant) -> Request {
        self.resend_count += 1;
        self.issued_at = now;
        self.request.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RequestKind;

    #[test]
    fn test_overdue_only_after_timeout() {
        let start = Instant::now();
        let pending = PendingRequest::new(Request::full_sweep(), start);
        let timeout = Duration::from_millis(500);

        assert!(!pending.is_overdue(start + Duration::from_millis(499), timeout));
        assert!(!pending.is_overdue(start + timeout, timeout));
        assert!(pending.is_overdue(start + Duration::from_millis(501), timeout));
    }

    #[test]
    fn test_resend_moves_deadline_only() {
        let start = Instant::now();
        let request = Request::new(RequestKind::ContactData, vec![2, 5]);
        let mut pending = PendingRequest::new(request.clone(), start);

        let later = start + Duration::from_millis(600);
        assert_eq!(pending.on_resend(later), request);
        assert_eq!(pending.issued_at(), later);
        assert_eq!(pending.resend_count(), 1);
        assert_eq!(pending.request(), &request);
    }
}
