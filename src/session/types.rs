use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A protected backend resource with its own bearer credential.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Resource {
    Policy,
    Deliberation,
}

impl Resource {
    pub const ALL: [Resource; 2] = [Resource::Policy, Resource::Deliberation];
}

/// Point-in-time view of the session state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub policy: bool,
    pub deliberation: bool,
}

impl SessionSnapshot {
    pub fn authenticated(&self, resource: Resource) -> bool {
        match resource {
            Resource::Policy => self.policy,
            Resource::Deliberation => self.deliberation,
        }
    }
}
