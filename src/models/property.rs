use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A managed rental property. Owned by a host; tasks reference it for
/// location and ownership lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub host_id: Uuid,
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl Property {
    /// Full address used as the marketplace search location.
    pub fn full_address(&self) -> String {
        format!(
            "{}, {}, {} {}",
            self.street, self.city, self.state, self.zip_code
        )
    }
}
