use crate::schema::*;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Queryable, Identifiable)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub venue: Option<String>,
    pub image_url: Option<String>,
    pub date: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    /// 0 means unlimited.
    pub max_registrations: i32,
    pub current_registrations: i32,
    pub is_team_event: bool,
    pub min_team_size: i32,
    pub max_team_size: i32,
    pub registration_open: bool,
    pub members_only: bool,
    pub visible: bool,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn is_full(&self) -> bool {
        self.max_registrations != 0 && self.current_registrations >= self.max_registrations
    }
}

/// Editable event fields, shared by create and update.
#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[diesel(table_name = events)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub venue: Option<String>,
    pub image_url: Option<String>,
    pub date: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_registrations: i32,
    #[serde(default)]
    pub is_team_event: bool,
    #[serde(default = "one")]
    pub min_team_size: i32,
    #[serde(default = "one")]
    pub max_team_size: i32,
    #[serde(default = "yes")]
    pub registration_open: bool,
    #[serde(default)]
    pub members_only: bool,
    #[serde(default = "yes")]
    pub visible: bool,
}

fn one() -> i32 {
    1
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for RegistrationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RegistrationStatus::Pending),
            "approved" => Ok(RegistrationStatus::Approved),
            "rejected" => Ok(RegistrationStatus::Rejected),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a registration record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationKind {
    Event,
    GeneralMembership,
}

impl RegistrationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationKind::Event => "event",
            RegistrationKind::GeneralMembership => "general_membership",
        }
    }
}

impl FromStr for RegistrationKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event" => Ok(RegistrationKind::Event),
            "general_membership" => Ok(RegistrationKind::GeneralMembership),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown variant `{0}`")]
pub struct UnknownVariant(pub String);

/// A registrant as submitted on a form and as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub full_name: String,
    pub roll_no: String,
    pub branch: String,
    pub section: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: i32,
    pub kind: RegistrationKind,
    pub event_id: Option<i32>,
    pub team_name: Option<String>,
    pub status: RegistrationStatus,
    pub members: Vec<Member>,
    pub created_at: DateTime<Utc>,
}

impl Registration {
    pub fn leader(&self) -> Option<&Member> {
        self.members.first()
    }

    pub fn seats(&self) -> i32 {
        self.members.len() as i32
    }
}

#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub kind: RegistrationKind,
    pub event_id: Option<i32>,
    pub team_name: Option<String>,
    pub status: RegistrationStatus,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFilter {
    pub event_id: Option<i32>,
    pub kind: Option<RegistrationKind>,
    pub status: Option<RegistrationStatus>,
}

impl RegistrationFilter {
    pub fn matches(&self, registration: &Registration) -> bool {
        self.event_id.map_or(true, |id| registration.event_id == Some(id))
            && self.kind.map_or(true, |k| registration.kind == k)
            && self.status.map_or(true, |s| registration.status == s)
    }
}

/// Club website roster entry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Queryable, Identifiable)]
#[diesel(table_name = roster_entries)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: i32,
    pub name: String,
    pub role: String,
    pub image_url: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub display_order: i32,
}

#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[diesel(table_name = roster_entries)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct RosterInput {
    pub name: String,
    pub role: String,
    pub image_url: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    #[serde(default)]
    pub display_order: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Queryable, Identifiable)]
#[serde(rename_all = "camelCase")]
pub struct Popup {
    pub id: i32,
    pub title: String,
    pub message: String,
    pub image_url: Option<String>,
    pub link: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[diesel(table_name = popups)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct PopupInput {
    pub title: String,
    #[serde(default)]
    pub message: String,
    pub image_url: Option<String>,
    pub link: Option<String>,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Queryable, Identifiable)]
#[diesel(table_name = gallery_items)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub id: i32,
    pub title: String,
    pub image_url: String,
    pub event_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = gallery_items)]
#[serde(rename_all = "camelCase")]
pub struct GalleryInput {
    pub title: String,
    pub image_url: String,
    pub event_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub events: i64,
    pub open_events: i64,
    pub event_registrations: i64,
    pub pending_applications: i64,
    pub members: i64,
}
