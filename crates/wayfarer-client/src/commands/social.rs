//! Follows, trip bookings and notifications.  All local-only.

use chrono::Utc;
use tracing::info;

use wayfarer_shared::types::{NotificationId, TripId, UserId};
use wayfarer_store::{Notification, NotificationKind, StorageKey};

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::events::ClientEvent;
use crate::state::AppState;

impl Client {
    // ------------------------------------------------------------------
    // Follows
    // ------------------------------------------------------------------

    /// Follow or unfollow `user`.  Returns whether they are now followed.
    pub fn toggle_follow(&self, user: &UserId) -> Result<bool> {
        let mut state = self.lock()?;
        let me = state.current_user()?;
        if &me == user {
            return Err(ClientError::Forbidden("cannot follow yourself"));
        }

        let previous = state.followed_users.clone();
        let following = match state.followed_users.iter().position(|u| u == user) {
            Some(i) => {
                state.followed_users.remove(i);
                false
            }
            None => {
                state.followed_users.push(user.clone());
                true
            }
        };
        if let Err(e) = state.persist(StorageKey::FollowedUsers) {
            state.followed_users = previous;
            return Err(e);
        }
        Ok(following)
    }

    pub fn is_following(&self, user: &UserId) -> Result<bool> {
        self.read(|s| s.followed_users.contains(user))
    }

    // ------------------------------------------------------------------
    // Trips
    // ------------------------------------------------------------------

    /// Returns `false` if the trip was already booked.
    pub fn book_trip(&self, trip: TripId) -> Result<bool> {
        let mut state = self.lock()?;
        if state.booked_trips.contains(&trip) {
            return Ok(false);
        }
        state.booked_trips.push(trip.clone());
        if let Err(e) = state.persist(StorageKey::BookedTrips) {
            state.booked_trips.pop();
            return Err(e);
        }
        info!(%trip, "trip booked");
        Ok(true)
    }

    /// Returns `false` if the trip was not booked.
    pub fn cancel_trip(&self, trip: &TripId) -> Result<bool> {
        let mut state = self.lock()?;
        let previous = state.booked_trips.clone();
        state.booked_trips.retain(|t| t != trip);
        if state.booked_trips.len() == previous.len() {
            return Ok(false);
        }
        if let Err(e) = state.persist(StorageKey::BookedTrips) {
            state.booked_trips = previous;
            return Err(e);
        }
        info!(%trip, "trip cancelled");
        Ok(true)
    }

    pub fn booked_trips(&self) -> Result<Vec<TripId>> {
        self.read(|s| s.booked_trips.clone())
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    pub fn push_notification(
        &self,
        kind: NotificationKind,
        text: &str,
        link: Option<String>,
    ) -> Result<Notification> {
        let notification = Notification {
            id: NotificationId::new(),
            kind,
            text: text.to_string(),
            link,
            read: false,
            created_at: Utc::now(),
        };
        self.update_notifications(|list| {
            list.push(notification.clone());
        })?;
        Ok(notification)
    }

    /// Returns `false` if it was already read or does not exist.
    pub fn mark_notification_read(&self, id: NotificationId) -> Result<bool> {
        self.update_notifications(|list| {
            match list.iter_mut().find(|n| n.id == id && !n.read) {
                Some(n) => {
                    n.read = true;
                    true
                }
                None => false,
            }
        })
    }

    /// Returns how many notifications were flipped.
    pub fn mark_all_notifications_read(&self) -> Result<usize> {
        self.update_notifications(|list| {
            list.iter_mut()
                .filter(|n| !n.read)
                .map(|n| n.read = true)
                .count()
        })
    }

    pub fn unread_notifications(&self) -> Result<usize> {
        self.read(unread_count)
    }

    /// Newest first.
    pub fn notifications(&self) -> Result<Vec<Notification>> {
        self.read(|s| {
            let mut list = s.notifications.clone();
            list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            list
        })
    }

    fn update_notifications<R>(&self, f: impl FnOnce(&mut Vec<Notification>) -> R) -> Result<R> {
        let (out, unread) = {
            let mut state = self.lock()?;
            let previous = state.notifications.clone();
            let out = f(&mut state.notifications);
            if let Err(e) = state.persist(StorageKey::Notifications) {
                state.notifications = previous;
                return Err(e);
            }
            (out, unread_count(&state))
        };
        self.emit(ClientEvent::NotificationsChanged { unread });
        Ok(out)
    }
}

fn unread_count(state: &AppState) -> usize {
    state.notifications.iter().filter(|n| !n.read).count()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wayfarer_store::{Database, Profile};

    use super::*;
    use crate::remote::OfflineBackend;
    use crate::state::Session;

    fn client() -> Client {
        let mut state = AppState::new(Database::open_in_memory().unwrap());
        state.session = Session::Mock(Profile::mock("me"));
        Client::new(state, Arc::new(OfflineBackend))
    }

    #[test]
    fn follow_toggles() {
        let client = client();
        let ana = UserId::from("ana");
        assert!(client.toggle_follow(&ana).unwrap());
        assert!(client.is_following(&ana).unwrap());
        assert!(!client.toggle_follow(&ana).unwrap());
        assert!(!client.is_following(&ana).unwrap());
    }

    #[test]
    fn booking_twice_is_a_no_op() {
        let client = client();
        let trip = TripId::from("patagonia-2026");
        assert!(client.book_trip(trip.clone()).unwrap());
        assert!(!client.book_trip(trip.clone()).unwrap());
        assert_eq!(client.booked_trips().unwrap(), vec![trip.clone()]);
        assert!(client.cancel_trip(&trip).unwrap());
        assert!(!client.cancel_trip(&trip).unwrap());
    }

    #[test]
    fn notifications_unread_count() {
        let client = client();
        let first = client
            .push_notification(NotificationKind::Like, "Ana liked your post", None)
            .unwrap();
        client
            .push_notification(NotificationKind::JoinRequest, "New join request", None)
            .unwrap();
        assert_eq!(client.unread_notifications().unwrap(), 2);

        assert!(client.mark_notification_read(first.id).unwrap());
        assert!(!client.mark_notification_read(first.id).unwrap());
        assert_eq!(client.mark_all_notifications_read().unwrap(), 1);
        assert_eq!(client.unread_notifications().unwrap(), 0);
    }

    #[test]
    fn failed_write_restores_previous_values() {
        let client = client();
        let trip = TripId::from("lapland");
        client.book_trip(trip.clone()).unwrap();
        client
            .push_notification(NotificationKind::Like, "Ana liked your post", None)
            .unwrap();
        client
            .state()
            .lock()
            .unwrap()
            .database
            .conn()
            .execute_batch(
                "CREATE TEMP TRIGGER refuse_writes BEFORE INSERT ON local_storage
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        assert!(client.toggle_follow(&UserId::from("ana")).is_err());
        assert!(!client.is_following(&UserId::from("ana")).unwrap());
        assert!(client.book_trip(TripId::from("faroe")).is_err());
        assert!(client.cancel_trip(&trip).is_err());
        assert_eq!(client.booked_trips().unwrap(), vec![trip]);
        assert!(client.mark_all_notifications_read().is_err());
        assert_eq!(client.unread_notifications().unwrap(), 1);
    }
}
