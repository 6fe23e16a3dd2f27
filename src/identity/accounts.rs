// region:    --- Imports
use super::Role;
use crate::error::{AuctionError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// endregion: --- Imports

// region:    --- Profiles
/// Stored under `users/{uid}`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub gender: String,
    pub city: String,
    pub role: Role,
}

/// Stored under `sellers/{uid}`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SellerProfile {
    pub uid: String,
    pub business_name: String,
    pub seller_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub role: Role,
    pub approved: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date_joined: DateTime<Utc>,
}

// endregion: --- Profiles

// region:    --- Registration Forms
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub city: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SellerRegistration {
    pub business_name: String,
    pub seller_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub terms_accepted: bool,
}

/// `local@domain.tld`, no whitespace, a single `@`
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rfind('.') {
        Some(dot) => dot > 0 && dot + 1 < domain.len(),
        None => false,
    }
}

fn check(problems: &mut Vec<&'static str>, ok: bool, message: &'static str) {
    if !ok {
        problems.push(message);
    }
}

fn into_result(problems: Vec<&'static str>) -> Result<()> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(AuctionError::InvalidInput(problems.join(" ")))
    }
}

impl UserRegistration {
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        check(
            &mut problems,
            self.name.trim().chars().count() >= 5,
            "Name must be at least 5 characters.",
        );
        check(&mut problems, is_valid_email(&self.email), "Invalid email.");
        check(
            &mut problems,
            self.password.trim().chars().count() >= 6,
            "Password must be at least 6 characters.",
        );
        check(&mut problems, !self.gender.trim().is_empty(), "Select your gender.");
        check(&mut problems, !self.city.trim().is_empty(), "Select a city.");
        into_result(problems)
    }

    pub fn into_profile(self, uid: String) -> UserProfile {
        UserProfile {
            uid,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            gender: self.gender,
            city: self.city,
            role: Role::User,
        }
    }
}

impl SellerRegistration {
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        check(
            &mut problems,
            self.business_name.trim().chars().count() >= 3,
            "Business name must be at least 3 characters.",
        );
        check(
            &mut problems,
            self.seller_name.trim().chars().count() >= 5,
            "Seller name must be at least 5 characters.",
        );
        check(&mut problems, is_valid_email(&self.email), "Invalid email.");
        let phone = self.phone.trim();
        check(
            &mut problems,
            phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit()),
            "Phone number must be 10 digits.",
        );
        check(
            &mut problems,
            self.password.trim().chars().count() >= 6,
            "Password must be at least 6 characters.",
        );
        check(
            &mut problems,
            self.address.trim().chars().count() >= 10,
            "Please enter a valid address (min 10 characters).",
        );
        check(&mut problems, !self.city.trim().is_empty(), "Select a city.");
        check(
            &mut problems,
            self.terms_accepted,
            "You must accept the terms and conditions.",
        );
        into_result(problems)
    }

    pub fn into_profile(self, uid: String, date_joined: DateTime<Utc>) -> SellerProfile {
        SellerProfile {
            uid,
            business_name: self.business_name.trim().to_string(),
            seller_name: self.seller_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            city: self.city,
            role: Role::Seller,
            approved: false,
            date_joined,
        }
    }
}

// endregion: --- Registration Forms

// region:    --- Profile Edits
fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim)
}

/// Admin edit of a bidder profile. The email is the account key and stays put.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub city: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.gender.is_none() && self.city.is_none()
    }

    /// Same rules as registration, for the fields present
    pub fn apply_to(&self, profile: &mut UserProfile) -> Result<()> {
        let mut problems = Vec::new();
        if let Some(name) = trimmed(&self.name) {
            check(&mut problems, name.chars().count() >= 5, "Name must be at least 5 characters.");
        }
        if let Some(gender) = trimmed(&self.gender) {
            check(&mut problems, !gender.is_empty(), "Select your gender.");
        }
        if let Some(city) = trimmed(&self.city) {
            check(&mut problems, !city.is_empty(), "Select a city.");
        }
        into_result(problems)?;

        if let Some(name) = trimmed(&self.name) {
            profile.name = name.to_string();
        }
        if let Some(gender) = trimmed(&self.gender) {
            profile.gender = gender.to_string();
        }
        if let Some(city) = trimmed(&self.city) {
            profile.city = city.to_string();
        }
        Ok(())
    }
}

/// Admin edit of a seller profile, including approval
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SellerPatch {
    pub business_name: Option<String>,
    pub seller_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub approved: Option<bool>,
}

impl SellerPatch {
    pub fn is_empty(&self) -> bool {
        self.business_name.is_none()
            && self.seller_name.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.approved.is_none()
    }

    pub fn apply_to(&self, profile: &mut SellerProfile) -> Result<()> {
        let mut problems = Vec::new();
        if let Some(business_name) = trimmed(&self.business_name) {
            check(
                &mut problems,
                business_name.chars().count() >= 3,
                "Business name must be at least 3 characters.",
            );
        }
        if let Some(seller_name) = trimmed(&self.seller_name) {
            check(
                &mut problems,
                seller_name.chars().count() >= 5,
                "Seller name must be at least 5 characters.",
            );
        }
        if let Some(phone) = trimmed(&self.phone) {
            check(
                &mut problems,
                phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit()),
                "Phone number must be 10 digits.",
            );
        }
        if let Some(address) = trimmed(&self.address) {
            check(
                &mut problems,
                address.chars().count() >= 10,
                "Please enter a valid address (min 10 characters).",
            );
        }
        if let Some(city) = trimmed(&self.city) {
            check(&mut problems, !city.is_empty(), "Select a city.");
        }
        into_result(problems)?;

        if let Some(business_name) = trimmed(&self.business_name) {
            profile.business_name = business_name.to_string();
        }
        if let Some(seller_name) = trimmed(&self.seller_name) {
            profile.seller_name = seller_name.to_string();
        }
        if let Some(phone) = trimmed(&self.phone) {
            profile.phone = phone.to_string();
        }
        if let Some(address) = trimmed(&self.address) {
            profile.address = address.to_string();
        }
        if let Some(city) = trimmed(&self.city) {
            profile.city = city.to_string();
        }
        if let Some(approved) = self.approved {
            profile.approved = approved;
        }
        Ok(())
    }
}

// endregion: --- Profile Edits

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    fn seller_form() -> SellerRegistration {
        SellerRegistration {
            business_name: "Ravi Antiques".to_string(),
            seller_name: "Ravi Kumar".to_string(),
            email: "ravi@antiques.in".to_string(),
            phone: "9876543210".to_string(),
            password: "hunter22".to_string(),
            address: "12 MG Road, Pune".to_string(),
            city: "Pune".to_string(),
            terms_accepted: true,
        }
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email(" someone@mail.example.com "));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("@c.com"));
        assert!(!is_valid_email("a@@c.com"));
        assert!(!is_valid_email("a@c."));
        assert!(!is_valid_email("a@.com"));
    }

    #[test]
    fn user_form_reports_every_problem() {
        let form = UserRegistration {
            name: "Abe".to_string(),
            email: "abe".to_string(),
            password: "123".to_string(),
            gender: String::new(),
            city: "Delhi".to_string(),
        };
        let Err(AuctionError::InvalidInput(msg)) = form.validate() else {
            panic!("expected validation failure");
        };
        assert!(msg.contains("Name"));
        assert!(msg.contains("email"));
        assert!(msg.contains("Password"));
        assert!(msg.contains("gender"));
        assert!(!msg.contains("city"));
    }

    #[test]
    fn seller_form_accepts_a_complete_submission() {
        assert_eq!(seller_form().validate(), Ok(()));
    }

    #[test]
    fn seller_phone_must_be_ten_digits() {
        let mut form = seller_form();
        form.phone = "98765-4321".to_string();
        assert!(form.validate().is_err());
    }

    #[test]
    fn seller_must_accept_terms() {
        let mut form = seller_form();
        form.terms_accepted = false;
        assert!(form.validate().is_err());
    }

    #[test]
    fn bad_seller_edit_leaves_profile_untouched() {
        let mut profile = seller_form().into_profile("uid-1".to_string(), Utc::now());
        let before = profile.clone();
        let patch = SellerPatch {
            business_name: Some("Ravi & Sons".to_string()),
            phone: Some("12345".to_string()),
            ..SellerPatch::default()
        };
        assert!(patch.apply_to(&mut profile).is_err());
        assert_eq!(profile, before);

        let approve = SellerPatch {
            approved: Some(true),
            city: Some(" Mumbai ".to_string()),
            ..SellerPatch::default()
        };
        approve.apply_to(&mut profile).unwrap();
        assert!(profile.approved);
        assert_eq!(profile.city, "Mumbai");
        assert_eq!(profile.email, before.email);
    }

    #[test]
    fn seller_profile_starts_unapproved() {
        let profile = seller_form().into_profile("uid-1".to_string(), Utc::now());
        assert!(!profile.approved);
        assert_eq!(profile.role, Role::Seller);
    }
}
// endregion: --- Tests
