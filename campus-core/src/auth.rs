use serde::{Deserialize, Serialize};

/// Role a user acts under. Carried in JWT claims and stored on the user row;
/// the server treats the stored role as authoritative.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Administrator,
    Teacher,
    Parent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "ADMINISTRATOR",
            Role::Teacher => "TEACHER",
            Role::Parent => "PARENT",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
