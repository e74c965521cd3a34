//! Profile store port — user attributes and segment membership.

use std::collections::HashMap;
use std::future::Future;

use driphub_domain::error::DripHubError;
use driphub_domain::id::UserId;

/// Read/write access to user profiles.
///
/// Reads feed condition evaluation and email recipient resolution; writes
/// come from the `update_profile` / segment action executors.
pub trait ProfileStore {
    /// Fetch the attribute map for a user. An unknown user yields an
    /// empty map, not an error.
    fn get_user_data(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<HashMap<String, serde_json::Value>, DripHubError>> + Send;

    /// Merge attribute updates into a user's profile.
    fn update_profile(
        &self,
        user_id: &UserId,
        updates: HashMap<String, serde_json::Value>,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send;

    /// Add a user to a segment. Adding twice is a no-op.
    fn add_to_segment(
        &self,
        user_id: &UserId,
        segment_id: &str,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send;

    /// Remove a user from a segment. Removing a non-member is a no-op.
    fn remove_from_segment(
        &self,
        user_id: &UserId,
        segment_id: &str,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send;
}
