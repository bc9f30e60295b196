use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Remote users currently typing in the active conversation.
#[derive(Debug, Clone)]
pub struct TypingTracker {
    local_user: String,
    timeout: Duration,
    last_seen: HashMap<String, Instant>,
}

impl TypingTracker {
    pub fn new(local_user: impl Into<String>, timeout: Duration) -> Self {
        Self {
            local_user: local_user.into(),
            timeout,
            last_seen: HashMap::new(),
        }
    }

    /// Returns `true` if `user` was not already shown as typing.
    pub fn started(&mut self, user: &str, now: Instant) -> bool {
        if user == self.local_user {
            return false;
        }
        self.last_seen.insert(user.to_string(), now).is_none()
    }

    pub fn stopped(&mut self, user: &str) -> bool {
        self.last_seen.remove(user).is_some()
    }

    /// Drops users whose last typing signal is older than the timeout.
    pub fn expire(&mut self, now: Instant) -> bool {
        let timeout = self.timeout;
        let before = self.last_seen.len();
        self.last_seen
            .retain(|_, seen| now.saturating_duration_since(*seen) < timeout);
        self.last_seen.len() != before
    }

    pub fn users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.last_seen.keys().cloned().collect();
        users.sort();
        users
    }

    pub fn clear(&mut self) -> bool {
        let had_any = !self.last_seen.is_empty();
        self.last_seen.clear();
        had_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_user_is_never_tracked() {
        let mut tracker = TypingTracker::new("me", Duration::from_secs(5));
        assert!(!tracker.started("me", Instant::now()));
        assert!(tracker.users().is_empty());
    }

    #[test]
    fn test_start_stop() {
        let mut tracker = TypingTracker::new("me", Duration::from_secs(5));
        let now = Instant::now();
        assert!(tracker.started("mentor", now));
        assert!(!tracker.started("mentor", now));
        assert_eq!(tracker.users(), vec!["mentor"]);
        assert!(tracker.stopped("mentor"));
        assert!(!tracker.stopped("mentor"));
    }

    #[test]
    fn test_expire_after_timeout() {
        let mut tracker = TypingTracker::new("me", Duration::from_secs(5));
        let start = Instant::now();
        tracker.started("a", start);
        tracker.started("b", start + Duration::from_secs(3));
        assert!(!tracker.expire(start + Duration::from_secs(4)));
        assert!(tracker.expire(start + Duration::from_secs(6)));
        assert_eq!(tracker.users(), vec!["b"]);
        // a fresh signal refreshes the deadline
        tracker.started("b", start + Duration::from_secs(7));
        assert!(!tracker.expire(start + Duration::from_secs(10)));
        assert!(tracker.expire(start + Duration::from_secs(12)));
        assert!(tracker.users().is_empty());
    }
}
