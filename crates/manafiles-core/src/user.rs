use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ManafilesError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Argon2 PHC string. Never sent to clients.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signup {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

impl Signup {
    /// Trim the username and email, treat a blank email as absent, and
    /// reject blank usernames or passwords.
    pub fn normalized(&self) -> Result<Signup, ManafilesError> {
        let username = self.username.trim().to_string();
        if username.is_empty() {
            return Err(ManafilesError::MissingField("username".into()));
        }
        if self.password.is_empty() {
            return Err(ManafilesError::MissingField("password".into()));
        }
        let email = self
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);
        Ok(Signup {
            username,
            email,
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
}

/// Insert payload for the users table; the password is already hashed.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_trims_and_drops_blank_email() {
        let s = Signup {
            username: "  alice ".into(),
            email: Some("   ".into()),
            password: "pw1".into(),
        }
        .normalized()
        .unwrap();
        assert_eq!(s.username, "alice");
        assert_eq!(s.email, None);
        assert_eq!(s.password, "pw1");
    }

    #[test]
    fn test_normalized_rejects_missing_fields() {
        let err = Signup {
            username: " ".into(),
            email: None,
            password: "pw".into(),
        }
        .normalized()
        .unwrap_err();
        assert!(matches!(err, ManafilesError::MissingField(ref f) if f == "username"));

        let err = Signup {
            username: "bob".into(),
            email: None,
            password: String::new(),
        }
        .normalized()
        .unwrap_err();
        assert!(matches!(err, ManafilesError::MissingField(ref f) if f == "password"));
    }

    #[test]
    fn test_user_json_omits_password_hash() {
        let user = User {
            id: "u1".into(),
            username: "alice".into(),
            email: Some("a@x.com".into()),
            password_hash: "$argon2id$secret".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        let back: User = serde_json::from_value(json).unwrap();
        assert_eq!(back.username, "alice");
        assert!(back.password_hash.is_empty());
    }
}
