use std::fmt;

use serde::{Deserialize, Serialize};

/// The author of a conversation turn.
///
/// Deserialization is lenient: any role value other than the string `model`
/// becomes [`Role::User`], whether it is another string, `null`, a number, or
/// anything else.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "serde_json::Value")]
pub enum Role {
    /// A turn written by the person at the keyboard.
    #[default]
    User,

    /// A turn produced by the model.
    Model,
}

impl Role {
    /// Normalizes a raw role string.
    pub fn normalize(role: &str) -> Self {
        match role {
            "model" => Role::Model,
            _ => Role::User,
        }
    }

    /// Returns the wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl From<serde_json::Value> for Role {
    fn from(role: serde_json::Value) -> Self {
        role.as_str().map(Role::normalize).unwrap_or_default()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_value, json, to_value};

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(to_value(Role::User).unwrap(), json!("user"));
        assert_eq!(to_value(Role::Model).unwrap(), json!("model"));
    }

    #[test]
    fn unknown_roles_become_user() {
        let role: Role = from_value(json!("assistant")).unwrap();
        assert_eq!(role, Role::User);
        let role: Role = from_value(json!("system")).unwrap();
        assert_eq!(role, Role::User);
        let role: Role = from_value(json!(null)).unwrap();
        assert_eq!(role, Role::User);
        let role: Role = from_value(json!("model")).unwrap();
        assert_eq!(role, Role::Model);
    }

    #[test]
    fn non_string_roles_become_user() {
        for value in [json!(7), json!(true), json!({"name": "model"}), json!(["model"])] {
            let role: Role = from_value(value.clone()).unwrap();
            assert_eq!(role, Role::User, "{value}");
        }
    }
}
