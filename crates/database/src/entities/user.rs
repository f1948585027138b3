//! User entity definitions

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ids::{ChatId, UserId};

/// Registered user together with its contact list and chat index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub gender: Gender,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub contacts: BTreeSet<UserId>,
    /// Reverse index of the chats listing this user as a member.
    pub chat_ids: BTreeSet<ChatId>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Registration payload. Every field is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub gender: Option<Gender>,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
}

impl NewUser {
    /// All missing fields, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.id.is_blank() {
            missing.push("id");
        }
        if self.username.trim().is_empty() {
            missing.push("username");
        }
        if self.first_name.trim().is_empty() {
            missing.push("first_name");
        }
        if self.last_name.trim().is_empty() {
            missing.push("last_name");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        if self.gender.is_none() {
            missing.push("gender");
        }
        if self.email.trim().is_empty() {
            missing.push("email");
        }
        if self.date_of_birth.is_none() {
            missing.push("date_of_birth");
        }
        missing
    }

    pub fn into_user(self) -> Result<User, Vec<&'static str>> {
        let missing = self.missing_fields();
        match (self.gender, self.date_of_birth) {
            (Some(gender), Some(date_of_birth)) if missing.is_empty() => Ok(User {
                id: self.id,
                username: self.username,
                first_name: self.first_name,
                last_name: self.last_name,
                password: self.password,
                gender,
                email: self.email,
                date_of_birth,
                contacts: BTreeSet::new(),
                chat_ids: BTreeSet::new(),
                created_at: Utc::now(),
                deleted_at: None,
            }),
            _ => Err(missing),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::NonBinary => "non_binary",
        }
    }
}

impl From<&str> for Gender {
    fn from(s: &str) -> Self {
        match s {
            "male" => Gender::Male,
            "female" => Gender::Female,
            _ => Gender::NonBinary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> NewUser {
        NewUser {
            id: UserId::new("u1"),
            username: "alice".into(),
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
            password: "rabbit".into(),
            gender: Some(Gender::Female),
            email: "alice@example.com".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 4),
        }
    }

    #[test]
    fn complete_registration_converts() {
        let user = complete().into_user().unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.chat_ids.is_empty());
        assert!(user.contacts.is_empty());
    }

    #[test]
    fn every_missing_field_is_reported() {
        let missing = NewUser::default().missing_fields();
        assert_eq!(
            missing,
            vec![
                "id",
                "username",
                "first_name",
                "last_name",
                "password",
                "gender",
                "email",
                "date_of_birth"
            ]
        );
    }

    #[test]
    fn male_is_a_valid_gender() {
        let mut new_user = complete();
        new_user.gender = Some(Gender::Male);
        assert!(new_user.missing_fields().is_empty());
    }

    #[test]
    fn gender_round_trips_through_storage_names() {
        for gender in [Gender::Male, Gender::Female, Gender::NonBinary] {
            assert_eq!(Gender::from(gender.as_str()), gender);
        }
    }
}
