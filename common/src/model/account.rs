use serde::{Deserialize, Serialize};

/// An account as known to the identity directory.
///
/// `id` is the directory's stable numeric identifier (kept as text, the way the
/// directory returns it); `user_name` is the login name users type into the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "ownerId")]
    pub id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
}
