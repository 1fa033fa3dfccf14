//! Per-post like/unlike bookkeeping.
//!
//! Every user has at most one entry in the ledger, carrying a single
//! [`EngagementKind`]. A user showing up as both liked and unliked is
//! therefore unrepresentable, not merely checked for.

use crate::model::{Id, user::UserMarker};
use serde::Serialize;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum EngagementKind {
    Liked,
    Unliked,
}

/// The per-user view of a post's engagement. `Neutral` means the user has no
/// entry in the ledger at all.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum EngagementState {
    #[default]
    Neutral,
    Liked,
    Unliked,
}

impl From<EngagementKind> for EngagementState {
    fn from(value: EngagementKind) -> Self {
        match value {
            EngagementKind::Liked => EngagementState::Liked,
            EngagementKind::Unliked => EngagementState::Unliked,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Engagement {
    pub user: Id<UserMarker>,
    pub created_at: UtcDateTime,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct EngagementEntry {
    pub user: Id<UserMarker>,
    pub kind: EngagementKind,
    pub created_at: UtcDateTime,
}

/// All engagement entries of one post, most recent first.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct EngagementLedger {
    entries: Vec<EngagementEntry>,
}

impl EngagementLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from stored entries, most recent first. Later
    /// duplicates of a user are dropped.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = EngagementEntry>) -> Self {
        let mut ledger = Self::new();
        for entry in entries {
            if ledger.state_for(entry.user) == EngagementState::Neutral {
                ledger.entries.push(entry);
            }
        }
        ledger
    }

    #[must_use]
    pub fn entries(&self) -> &[EngagementEntry] {
        &self.entries
    }

    #[must_use]
    pub fn state_for(&self, user: Id<UserMarker>) -> EngagementState {
        self.entries
            .iter()
            .find(|entry| entry.user == user)
            .map_or(EngagementState::Neutral, |entry| entry.kind.into())
    }

    /// Toggles the user's like. An existing like is removed; otherwise a like
    /// is inserted at the front, replacing any unlike by the same user.
    /// Returns the updated likes, most recent first.
    pub fn apply_like_at(&mut self, user: Id<UserMarker>, time: UtcDateTime) -> Vec<Engagement> {
        self.toggle_at(user, EngagementKind::Liked, time);
        self.likes()
    }

    pub fn apply_like(&mut self, user: Id<UserMarker>) -> Vec<Engagement> {
        self.apply_like_at(user, UtcDateTime::now())
    }

    /// Symmetric to [`Self::apply_like_at`] for unlikes. Returns the updated
    /// unlikes, most recent first.
    pub fn apply_unlike_at(&mut self, user: Id<UserMarker>, time: UtcDateTime) -> Vec<Engagement> {
        self.toggle_at(user, EngagementKind::Unliked, time);
        self.unlikes()
    }

    pub fn apply_unlike(&mut self, user: Id<UserMarker>) -> Vec<Engagement> {
        self.apply_unlike_at(user, UtcDateTime::now())
    }

    fn toggle_at(&mut self, user: Id<UserMarker>, kind: EngagementKind, time: UtcDateTime) {
        let existing_kind = self
            .entries
            .iter()
            .position(|entry| entry.user == user)
            .map(|position| self.entries.remove(position).kind);

        if existing_kind != Some(kind) {
            self.entries.insert(
                0,
                EngagementEntry {
                    user,
                    kind,
                    created_at: time,
                },
            );
        }
    }

    #[must_use]
    pub fn likes(&self) -> Vec<Engagement> {
        self.of_kind(EngagementKind::Liked)
    }

    #[must_use]
    pub fn unlikes(&self) -> Vec<Engagement> {
        self.of_kind(EngagementKind::Unliked)
    }

    fn of_kind(&self, kind: EngagementKind) -> Vec<Engagement> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| Engagement {
                user: entry.user,
                created_at: entry.created_at,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        engagement::{EngagementEntry, EngagementKind, EngagementLedger, EngagementState},
        user::UserMarker,
    };
    use time::macros::utc_datetime;

    const TIME: time::UtcDateTime = utc_datetime!(2025-11-03 12:00);

    fn user(id: u64) -> Id<UserMarker> {
        Id::from(id)
    }

    #[test]
    fn like_then_unlike_moves_user() {
        let mut ledger = EngagementLedger::new();
        let b = user(2);

        let likes = ledger.apply_like_at(b, TIME);
        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].user, b);
        assert_eq!(ledger.state_for(b), EngagementState::Liked);

        let unlikes = ledger.apply_unlike_at(b, TIME);
        assert_eq!(unlikes.len(), 1);
        assert_eq!(unlikes[0].user, b);
        assert!(ledger.likes().is_empty());
        assert_eq!(ledger.state_for(b), EngagementState::Unliked);

        let likes = ledger.apply_like_at(b, TIME);
        assert_eq!(likes.len(), 1);
        assert!(ledger.unlikes().is_empty());
        assert_eq!(ledger.state_for(b), EngagementState::Liked);
    }

    #[test]
    fn second_like_toggles_off() {
        let mut ledger = EngagementLedger::new();
        let u = user(7);

        ledger.apply_like_at(u, TIME);
        let likes = ledger.apply_like_at(u, TIME);

        assert!(likes.is_empty());
        assert!(ledger.unlikes().is_empty());
        assert_eq!(ledger.state_for(u), EngagementState::Neutral);
    }

    #[test]
    fn second_unlike_toggles_off() {
        let mut ledger = EngagementLedger::new();
        let u = user(7);

        ledger.apply_unlike_at(u, TIME);
        let unlikes = ledger.apply_unlike_at(u, TIME);

        assert!(unlikes.is_empty());
        assert_eq!(ledger.state_for(u), EngagementState::Neutral);
    }

    #[test]
    fn never_in_both_sets() {
        let mut ledger = EngagementLedger::new();
        let users = [user(1), user(2), user(3)];

        // Exhaust a bunch of interleavings and check the invariant after
        // every single step.
        for step in 0..64_u32 {
            for (index, &u) in users.iter().enumerate() {
                if (step + index as u32) % 2 == 0 {
                    ledger.apply_like_at(u, TIME);
                } else {
                    ledger.apply_unlike_at(u, TIME);
                }

                for &checked in &users {
                    let liked = ledger.likes().iter().any(|e| e.user == checked);
                    let unliked = ledger.unlikes().iter().any(|e| e.user == checked);
                    assert!(!(liked && unliked), "user in both likes and unlikes");
                }
            }
        }
    }

    #[test]
    fn newest_entries_first() {
        let mut ledger = EngagementLedger::new();

        ledger.apply_like_at(user(1), TIME);
        ledger.apply_like_at(user(2), TIME);
        ledger.apply_like_at(user(3), TIME);

        let order: Vec<_> = ledger.likes().iter().map(|e| e.user).collect();
        assert_eq!(order, vec![user(3), user(2), user(1)]);
    }

    #[test]
    fn from_entries_drops_duplicate_users() {
        let first = EngagementEntry {
            user: user(1),
            kind: EngagementKind::Liked,
            created_at: TIME,
        };
        let duplicate = EngagementEntry {
            user: user(1),
            kind: EngagementKind::Unliked,
            created_at: TIME,
        };

        let ledger = EngagementLedger::from_entries([first, duplicate]);

        assert_eq!(ledger.entries(), &[first]);
        assert_eq!(ledger.state_for(user(1)), EngagementState::Liked);
    }
}
