//! Read model of the external user directory.

use serde::{Deserialize, Serialize};

/// What the directory knows about a user. Copied into comments and
/// notifications at write time so reads need no join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  pub user_id:      String,
  pub display_name: String,
  pub photo_url:    Option<String>,
}
