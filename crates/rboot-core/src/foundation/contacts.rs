//! Roster of users known to the transport.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::message::User;

/// Shared roster of users the adapter knows about.
///
/// Adapters push users into it; scripts and event subscribers read it to
/// address people who have not written to the bot in the current
/// conversation. Clones share the same roster.
#[derive(Debug, Clone, Default)]
pub struct Contacts {
    users: Arc<RwLock<Vec<User>>>,
}

impl Contacts {
    /// Creates an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the roster with `users`.
    ///
    /// An empty list is ignored so a transport that failed to fetch its
    /// roster does not wipe the previous one.
    pub fn sync(&self, users: Vec<User>) {
        if users.is_empty() {
            return;
        }
        debug!(count = users.len(), "Contacts synced");
        *self.users.write() = users;
    }

    /// Adds `user` unless a user with the same id is already known.
    ///
    /// Returns true if the user was added.
    pub fn add(&self, user: User) -> bool {
        if user.is_anonymous() {
            return false;
        }
        let mut users = self.users.write();
        if users.contains(&user) {
            return false;
        }
        users.push(user);
        true
    }

    /// Returns a user by id, falling back to a display-name match.
    pub fn find(&self, id_or_name: &str) -> Option<User> {
        let users = self.users.read();
        users
            .iter()
            .find(|u| u.id == id_or_name)
            .or_else(|| users.iter().find(|u| u.name == id_or_name))
            .cloned()
    }

    /// Returns a snapshot of the roster.
    pub fn all(&self) -> Vec<User> {
        self.users.read().clone()
    }

    /// Returns the number of known users.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Returns true if no user is known.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}
