use serde::Serialize;

use crate::models::package::Package;

/// Represents a provisioned subscriber account.
#[derive(Clone, Debug, Serialize)]
pub struct User {
    /// The unique username, primary lookup key.
    pub username: String,
    /// Opaque stored credential; never part of any API response.
    #[serde(skip_serializing)]
    pub password: String,
    /// Hardware identifier binding the account to one device.
    pub hwid: String,
    /// Informational cache of the best active package.
    pub paket: Package,
    /// Unique bearer token for API authentication.
    pub token: String,
    /// Contact address, may be empty.
    pub email: String,
}
