//! Allow-list of known senders.
//!
//! Users live in an ordered `Vec` (persisted order) with an id → position index
//! next to it. Every mutation happens under the directory lock and keeps the
//! index a pure projection of the vector; removal swaps the last user into the
//! freed slot, so it rebuilds the index from scratch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{ChatId, UserId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    None,
    Admin,
    Owner,
}

impl Role {
    /// Admins and owners may manage the directory.
    pub fn can_manage_users(self) -> bool {
        matches!(self, Role::Admin | Role::Owner)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "user" => Some(Role::None),
            "admin" => Some(Role::Admin),
            "owner" => Some(Role::Owner),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::None => "none",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub role: Role,
    #[serde(
        rename = "privateChatID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub private_chat_id: Option<ChatId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            role: Role::None,
            private_chat_id: None,
            email: None,
        }
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    users: Vec<User>,
    index: HashMap<UserId, usize>,
}

impl DirectoryState {
    /// A repeated id keeps the first slot and the last entry's fields.
    fn from_users(users: Vec<User>) -> Self {
        let mut st = Self::default();
        for u in users {
            match st.index.get(&u.id) {
                Some(&pos) => {
                    warn!(user_id = u.id.0, "duplicate user in settings, keeping the last one");
                    st.users[pos] = u;
                }
                None => {
                    st.index.insert(u.id, st.users.len());
                    st.users.push(u);
                }
            }
        }
        st
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .users
            .iter()
            .enumerate()
            .map(|(pos, u)| (u.id, pos))
            .collect();
    }

    fn get_mut(&mut self, id: UserId) -> Option<&mut User> {
        let pos = *self.index.get(&id)?;
        self.users.get_mut(pos)
    }
}

/// Outcome of [`UserDirectory::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Replaced,
    AlreadyPresent,
}

#[derive(Debug, Default)]
pub struct UserDirectory {
    state: Mutex<DirectoryState>,
}

impl UserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        let st = DirectoryState::from_users(users);
        debug!(
            ids = ?st.users.iter().map(|u| u.id.0).collect::<Vec<_>>(),
            "user directory loaded"
        );
        Self {
            state: Mutex::new(st),
        }
    }

    pub async fn get(&self, id: UserId) -> Option<User> {
        let st = self.state.lock().await;
        st.index.get(&id).map(|&pos| st.users[pos].clone())
    }

    pub async fn contains(&self, id: UserId) -> bool {
        self.state.lock().await.index.contains_key(&id)
    }

    /// Case-insensitive lookup; a leading `@` is ignored.
    pub async fn find_by_username(&self, username: &str) -> Option<User> {
        let name = username.strip_prefix('@').unwrap_or(username);
        if name.is_empty() {
            return None;
        }
        let st = self.state.lock().await;
        st.users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(name))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Users in stored order.
    pub async fn list(&self) -> Vec<User> {
        self.state.lock().await.users.clone()
    }

    /// Insert `user`. An existing entry with the same id is overwritten unless
    /// `fail_if_exists` is set.
    pub async fn add(&self, user: User, fail_if_exists: bool) -> AddOutcome {
        let mut st = self.state.lock().await;
        if let Some(existing) = st.get_mut(user.id) {
            if fail_if_exists {
                return AddOutcome::AlreadyPresent;
            }
            *existing = user;
            return AddOutcome::Replaced;
        }

        let pos = st.users.len();
        st.index.insert(user.id, pos);
        st.users.push(user);
        AddOutcome::Added
    }

    /// Returns `false` if the user was not present.
    pub async fn remove(&self, id: UserId) -> bool {
        let mut st = self.state.lock().await;
        let Some(pos) = st.index.get(&id).copied() else {
            return false;
        };
        st.users.swap_remove(pos);
        st.rebuild_index();
        true
    }

    pub async fn set_role(&self, id: UserId, role: Role) -> bool {
        let mut st = self.state.lock().await;
        match st.get_mut(id) {
            Some(u) => {
                u.role = role;
                true
            }
            None => false,
        }
    }

    pub async fn set_email(&self, id: UserId, email: Option<String>) -> bool {
        let mut st = self.state.lock().await;
        match st.get_mut(id) {
            Some(u) => {
                u.email = email;
                true
            }
            None => false,
        }
    }

    /// Re-sync platform data that drifted since the user was stored.
    ///
    /// `private_chat` is only applied when the update came from a private chat.
    /// Returns `true` when something changed and the directory needs saving.
    pub async fn sync_profile(
        &self,
        id: UserId,
        username: Option<&str>,
        private_chat: Option<ChatId>,
    ) -> bool {
        let mut st = self.state.lock().await;
        let Some(u) = st.get_mut(id) else {
            return false;
        };

        let mut changed = false;
        if let Some(name) = username {
            if u.username != name {
                u.username = name.to_string();
                changed = true;
            }
        }
        if let Some(chat) = private_chat {
            if u.private_chat_id != Some(chat) {
                u.private_chat_id = Some(chat);
                changed = true;
            }
        }
        if changed {
            debug!(user = ?u, "user data re-synced");
        }
        changed
    }

    /// Grant `owner` to `id`, creating the entry if needed and binding the
    /// private chat the claim came from.
    ///
    /// Previous owners keep their role.
    pub async fn reset_owner(&self, id: UserId, username: &str, private_chat: ChatId) {
        info!(user_id = id.0, "reset owner");
        let mut st = self.state.lock().await;
        if let Some(u) = st.get_mut(id) {
            u.role = Role::Owner;
            u.private_chat_id = Some(private_chat);
            if !username.is_empty() {
                u.username = username.to_string();
            }
            return;
        }

        let pos = st.users.len();
        st.index.insert(id, pos);
        st.users.push(User {
            id,
            username: username.to_string(),
            role: Role::Owner,
            private_chat_id: Some(private_chat),
            email: None,
        });
    }

    #[cfg(test)]
    async fn index_matches_users(&self) -> bool {
        let st = self.state.lock().await;
        st.index.len() == st.users.len()
            && st
                .users
                .iter()
                .enumerate()
                .all(|(pos, u)| st.index.get(&u.id) == Some(&pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, name: &str) -> User {
        User::new(UserId(id), name)
    }

    #[tokio::test]
    async fn add_rejects_duplicates_when_asked() {
        let dir = UserDirectory::default();
        assert_eq!(dir.add(user(1, "alice"), true).await, AddOutcome::Added);
        assert_eq!(
            dir.add(user(1, "alice2"), true).await,
            AddOutcome::AlreadyPresent
        );
        assert_eq!(dir.get(UserId(1)).await.unwrap().username, "alice");

        assert_eq!(dir.add(user(1, "alice2"), false).await, AddOutcome::Replaced);
        assert_eq!(dir.get(UserId(1)).await.unwrap().username, "alice2");
        assert_eq!(dir.len().await, 1);
    }

    #[tokio::test]
    async fn duplicate_ids_collapse_on_load() {
        let dir = UserDirectory::new(vec![user(1, "old"), user(2, "b"), user(1, "new")]);
        assert_eq!(dir.len().await, 2);
        assert!(dir.index_matches_users().await);
        assert_eq!(dir.get(UserId(1)).await.unwrap().username, "new");

        assert!(dir.remove(UserId(1)).await);
        assert!(!dir.contains(UserId(1)).await);
        assert_eq!(dir.len().await, 1);
    }

    #[tokio::test]
    async fn index_stays_consistent_across_mutations() {
        let dir = UserDirectory::new(vec![user(1, "a"), user(2, "b"), user(3, "c")]);
        assert!(dir.index_matches_users().await);

        assert!(dir.remove(UserId(1)).await);
        assert!(dir.index_matches_users().await);
        assert!(dir.get(UserId(1)).await.is_none());
        assert_eq!(dir.get(UserId(3)).await.unwrap().username, "c");

        dir.add(user(4, "d"), true).await;
        assert!(dir.set_role(UserId(4), Role::Admin).await);
        assert!(dir.remove(UserId(3)).await);
        assert!(!dir.remove(UserId(3)).await);
        assert!(dir.index_matches_users().await);

        let ids: Vec<i64> = dir.list().await.iter().map(|u| u.id.0).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&2) && ids.contains(&4));
        assert_eq!(dir.get(UserId(4)).await.unwrap().role, Role::Admin);
    }

    #[tokio::test]
    async fn find_by_username_ignores_at_and_case() {
        let dir = UserDirectory::new(vec![user(7, "Mario")]);
        assert_eq!(dir.find_by_username("@mario").await.unwrap().id, UserId(7));
        assert_eq!(dir.find_by_username("MARIO").await.unwrap().id, UserId(7));
        assert!(dir.find_by_username("@").await.is_none());
        assert!(dir.find_by_username("luigi").await.is_none());
    }

    #[tokio::test]
    async fn sync_profile_reports_changes_only() {
        let dir = UserDirectory::new(vec![user(1, "old")]);
        assert!(dir.sync_profile(UserId(1), Some("new"), None).await);
        assert!(!dir.sync_profile(UserId(1), Some("new"), None).await);
        assert!(dir.sync_profile(UserId(1), None, Some(ChatId(10))).await);
        assert!(!dir.sync_profile(UserId(1), Some("new"), Some(ChatId(10))).await);
        assert!(!dir.sync_profile(UserId(99), Some("x"), None).await);

        let u = dir.get(UserId(1)).await.unwrap();
        assert_eq!(u.username, "new");
        assert_eq!(u.private_chat_id, Some(ChatId(10)));
    }

    #[tokio::test]
    async fn reset_owner_creates_or_promotes() {
        let dir = UserDirectory::new(vec![user(2, "bob")]);
        dir.reset_owner(UserId(1), "alice", ChatId(100)).await;
        dir.reset_owner(UserId(2), "", ChatId(200)).await;

        let alice = dir.get(UserId(1)).await.unwrap();
        assert_eq!(alice.role, Role::Owner);
        assert_eq!(alice.private_chat_id, Some(ChatId(100)));

        let bob = dir.get(UserId(2)).await.unwrap();
        assert_eq!(bob.role, Role::Owner);
        assert_eq!(bob.username, "bob");
        assert!(dir.index_matches_users().await);
    }

    #[test]
    fn user_json_shape() {
        let mut u = user(5, "eve");
        u.role = Role::Admin;
        u.private_chat_id = Some(ChatId(55));
        let v = serde_json::to_value(&u).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"id": 5, "username": "eve", "role": "admin", "privateChatID": 55})
        );

        let back: User = serde_json::from_value(serde_json::json!({"id": 6})).unwrap();
        assert_eq!(back.role, Role::None);
        assert!(back.private_chat_id.is_none());
    }
}
