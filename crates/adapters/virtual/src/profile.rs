//! In-memory implementation of [`ProfileStore`].

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;

use driphub_app::ports::ProfileStore;
use driphub_domain::error::DripHubError;
use driphub_domain::id::UserId;

#[derive(Default, Clone)]
struct Profile {
    attributes: HashMap<String, serde_json::Value>,
    segments: HashSet<String>,
}

/// Mutex-guarded map of user profiles.
///
/// Segment membership is surfaced to readers as a `segments` array
/// attribute, so conditions can match on it like any other field.
#[derive(Default)]
pub struct MemoryProfileStore {
    users: Mutex<HashMap<UserId, Profile>>,
}

impl MemoryProfileStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or extend a user profile with the given attributes.
    pub fn seed_user(&self, user_id: &UserId, attributes: &[(&str, serde_json::Value)]) {
        let mut users = self.users.lock().expect("profile lock poisoned");
        let profile = users.entry(user_id.clone()).or_default();
        for (key, value) in attributes {
            profile.attributes.insert((*key).to_string(), value.clone());
        }
    }

    /// Current segment membership for a user.
    #[must_use]
    pub fn segments_of(&self, user_id: &UserId) -> Vec<String> {
        let users = self.users.lock().expect("profile lock poisoned");
        users
            .get(user_id)
            .map(|p| {
                let mut segments: Vec<String> = p.segments.iter().cloned().collect();
                segments.sort();
                segments
            })
            .unwrap_or_default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn get_user_data(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<HashMap<String, serde_json::Value>, DripHubError>> + Send
    {
        let users = self.users.lock().expect("profile lock poisoned");
        let result = users
            .get(user_id)
            .map(|profile| {
                let mut data = profile.attributes.clone();
                let mut segments: Vec<&String> = profile.segments.iter().collect();
                segments.sort();
                data.insert("segments".to_string(), serde_json::json!(segments));
                data
            })
            .unwrap_or_default();
        async { Ok(result) }
    }

    fn update_profile(
        &self,
        user_id: &UserId,
        updates: HashMap<String, serde_json::Value>,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send {
        let mut users = self.users.lock().expect("profile lock poisoned");
        users
            .entry(user_id.clone())
            .or_default()
            .attributes
            .extend(updates);
        async { Ok(()) }
    }

    fn add_to_segment(
        &self,
        user_id: &UserId,
        segment_id: &str,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send {
        let mut users = self.users.lock().expect("profile lock poisoned");
        users
            .entry(user_id.clone())
            .or_default()
            .segments
            .insert(segment_id.to_string());
        async { Ok(()) }
    }

    fn remove_from_segment(
        &self,
        user_id: &UserId,
        segment_id: &str,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send {
        let mut users = self.users.lock().expect("profile lock poisoned");
        if let Some(profile) = users.get_mut(user_id) {
            profile.segments.remove(segment_id);
        }
        async { Ok(()) }
    }
}
