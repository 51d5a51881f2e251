//! Persistence behind a trait so handlers and the registration workflow can
//! run against Postgres or the in-memory store.

use crate::{
    error::{Classify, ErrorKind},
    models::{
        Event, EventInput, GalleryInput, GalleryItem, Member, NewRegistration, Popup, PopupInput,
        Registration, RegistrationFilter, RegistrationStatus, RosterEntry, RosterInput, Stats,
    },
};
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Downstream
    }
}

/// Unique key hit by a membership application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipKey {
    RollNo,
    Email,
    Phone,
}

impl MembershipKey {
    pub fn label(self) -> &'static str {
        match self {
            MembershipKey::RollNo => "roll number",
            MembershipKey::Email => "email",
            MembershipKey::Phone => "phone number",
        }
    }
}

/// Why a registration could not be committed.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("event not found")]
    EventNotFound,
    #[error("capacity reached")]
    CapacityReached,
    /// The (event, roll number) pair already exists.
    #[error("member already registered")]
    DuplicateMember,
    #[error("membership {} already used", .0.label())]
    DuplicateApplication(MembershipKey),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a conditional status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The status moved from `pending` to the target.
    Applied(Registration),
    /// The registration was not pending; it is returned unchanged.
    Unchanged(Registration),
    Missing,
}

#[async_trait]
pub trait Store: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn list_events(&self, include_hidden: bool) -> StoreResult<Vec<Event>>;
    async fn get_event(&self, id: i32) -> StoreResult<Option<Event>>;
    async fn create_event(&self, input: EventInput) -> StoreResult<Event>;
    async fn update_event(&self, id: i32, input: EventInput) -> StoreResult<Option<Event>>;
    async fn set_registration_open(&self, id: i32, open: bool) -> StoreResult<Option<Event>>;
    /// Deletes the event together with its registrations.
    async fn delete_event(&self, id: i32) -> StoreResult<bool>;

    /// First of `roll_nos` already registered for the event.
    async fn find_event_registrant(
        &self,
        event_id: i32,
        roll_nos: &[String],
    ) -> StoreResult<Option<Member>>;
    /// Which unique key of an existing membership application `member` hits.
    async fn find_membership_conflict(&self, member: &Member)
        -> StoreResult<Option<MembershipKey>>;
    /// Membership application (any status) holding this roll number.
    async fn find_membership(&self, roll_no: &str) -> StoreResult<Option<Registration>>;

    /// Inserts the registration and, for event registrations, claims one
    /// seat per member in the same atomic step.
    async fn commit_registration(&self, new: NewRegistration) -> Result<Registration, CommitError>;
    async fn get_registration(&self, id: i32) -> StoreResult<Option<Registration>>;
    async fn list_registrations(&self, filter: &RegistrationFilter)
        -> StoreResult<Vec<Registration>>;
    /// Moves a `pending` registration to `to`; never touches other states.
    async fn transition_status(&self, id: i32, to: RegistrationStatus) -> StoreResult<Transition>;
    /// Deletes a registration and releases its seats.
    async fn delete_registration(&self, id: i32) -> StoreResult<Option<Registration>>;
    async fn stats(&self) -> StoreResult<Stats>;

    async fn list_roster(&self) -> StoreResult<Vec<RosterEntry>>;
    async fn create_roster_entry(&self, input: RosterInput) -> StoreResult<RosterEntry>;
    async fn update_roster_entry(&self, id: i32, input: RosterInput)
        -> StoreResult<Option<RosterEntry>>;
    async fn delete_roster_entry(&self, id: i32) -> StoreResult<bool>;

    async fn list_popups(&self, active_only: bool) -> StoreResult<Vec<Popup>>;
    async fn create_popup(&self, input: PopupInput) -> StoreResult<Popup>;
    async fn update_popup(&self, id: i32, input: PopupInput) -> StoreResult<Option<Popup>>;
    async fn delete_popup(&self, id: i32) -> StoreResult<bool>;

    async fn list_gallery(&self, event_id: Option<i32>) -> StoreResult<Vec<GalleryItem>>;
    async fn create_gallery_item(&self, input: GalleryInput) -> StoreResult<GalleryItem>;
    async fn delete_gallery_item(&self, id: i32) -> StoreResult<bool>;
}
