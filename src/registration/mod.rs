//! Event registration, membership applications and their approval.

use crate::{
    email::{self, templates, Dispatch, DispatchReport, Mailer},
    error::{Classify, ErrorKind},
    models::{
        Event, Member, NewRegistration, Registration, RegistrationFilter, RegistrationKind,
        RegistrationStatus,
    },
    roll_no::{RollNoError, RollNumber},
    store::{CommitError, MembershipKey, Store, StoreError},
};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

pub mod approval;
pub mod eligibility;
pub mod team;

pub use approval::{ApprovalError, Decision};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("event not found")]
    NotFound,
    #[error("registration for this event is closed")]
    Closed,
    #[error("the registration deadline has passed")]
    DeadlinePassed,
    #[error("this event has already ended")]
    EventEnded,
    #[error("registration capacity reached")]
    CapacityReached,
    #[error("team must have between {min} and {max} members, got {actual}")]
    TeamSizeInvalid {
        min: usize,
        max: usize,
        actual: usize,
    },
    #[error("member details are required")]
    MissingMember,
    #[error("roll number {0} appears more than once in the team")]
    DuplicateInTeam(String),
    #[error("{member}: {field} is invalid")]
    InvalidField { member: String, field: &'static str },
    #[error("{member}: {source}")]
    InvalidRollNo { member: String, source: RollNoError },
    #[error("{member} ({roll_no}) is already registered for this event")]
    AlreadyRegistered { member: String, roll_no: String },
    #[error("an application with this {} already exists", .0.label())]
    AlreadyApplied(MembershipKey),
    #[error("no membership application found for this roll number")]
    ApplicationNotFound,
    #[error("{member} is from a different branch (code {code}) than the team leader (code {leader_code})")]
    BranchMismatchInTeam {
        member: String,
        code: String,
        leader_code: String,
    },
    #[error("only approved club members can register; not members: {}", .members.join(", "))]
    AccessDenied { members: Vec<String> },
    #[error("all team members must be in section {section}; mismatched: {}", .members.join(", "))]
    SectionMismatch { section: String, members: Vec<String> },
    #[error("announcement subject and message are required")]
    EmptyAnnouncement,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for RegistrationError {
    fn kind(&self) -> ErrorKind {
        use RegistrationError::*;
        match self {
            NotFound | ApplicationNotFound => ErrorKind::NotFound,
            Closed | DeadlinePassed | EventEnded | CapacityReached | AlreadyRegistered { .. }
            | AlreadyApplied(_) => ErrorKind::Conflict,
            AccessDenied { .. } => ErrorKind::Forbidden,
            TeamSizeInvalid { .. }
            | MissingMember
            | DuplicateInTeam(_)
            | InvalidField { .. }
            | InvalidRollNo { .. }
            | BranchMismatchInTeam { .. }
            | SectionMismatch { .. }
            | EmptyAnnouncement => ErrorKind::Validation,
            Store(_) => ErrorKind::Downstream,
        }
    }
}

/// Registration submission: an optional team name and the roster, leader
/// first.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub team_name: Option<String>,
    #[serde(default)]
    pub members: Vec<Member>,
}

#[derive(Debug)]
pub struct Registered {
    pub registration: Registration,
    pub emails: Dispatch,
}

#[derive(Clone)]
pub struct Registrar {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    club_name: Arc<str>,
}

impl Registrar {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, club_name: &str) -> Self {
        Self {
            store,
            mailer,
            club_name: club_name.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Registers a team or an individual for an event.
    pub async fn register(
        &self,
        event_id: i32,
        form: RegistrationForm,
        now: DateTime<Utc>,
    ) -> Result<Registered, RegistrationError> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or(RegistrationError::NotFound)?;

        eligibility::check_open(&event, now)?;
        let (team_name, members) = eligibility::assemble(&event, form)?;

        if event.members_only && event.is_team_event {
            team::check_roster(self.store.as_ref(), &members).await?;
        }

        let roll_nos: Vec<_> = members.iter().map(|m| m.roll_no.clone()).collect();
        if let Some(existing) = self.store.find_event_registrant(event.id, &roll_nos).await? {
            return Err(self.already_registered(&members, existing));
        }

        let committed = self
            .store
            .commit_registration(NewRegistration {
                kind: RegistrationKind::Event,
                event_id: Some(event.id),
                team_name,
                status: RegistrationStatus::Approved,
                members,
            })
            .await;

        let registration = match committed {
            Ok(registration) => registration,
            Err(CommitError::EventNotFound) => return Err(RegistrationError::NotFound),
            Err(CommitError::CapacityReached) => return Err(RegistrationError::CapacityReached),
            Err(CommitError::DuplicateMember) => {
                // lost a race with a concurrent submission for the same member
                let existing = self.store.find_event_registrant(event.id, &roll_nos).await?;
                return Err(match existing {
                    Some(existing) => self.already_registered(&[], existing),
                    None => RegistrationError::AlreadyRegistered {
                        member: "a team member".to_string(),
                        roll_no: roll_nos.join(", "),
                    },
                });
            }
            Err(CommitError::DuplicateApplication(key)) => {
                return Err(RegistrationError::AlreadyApplied(key))
            }
            Err(CommitError::Store(e)) => return Err(e.into()),
        };

        tracing::info!(
            event_id = event.id,
            registration_id = registration.id,
            seats = registration.seats(),
            "event registration committed"
        );

        let emails = registration
            .members
            .iter()
            .map(|m| templates::event_confirmation(&self.club_name, &event, &registration, m))
            .collect();
        let emails = email::dispatch(self.mailer.clone(), emails);

        Ok(Registered {
            registration,
            emails,
        })
    }

    fn already_registered(&self, submitted: &[Member], existing: Member) -> RegistrationError {
        // prefer the name from this submission
        let member = submitted
            .iter()
            .find(|m| m.roll_no == existing.roll_no)
            .map_or(existing.full_name, |m| m.full_name.clone());
        RegistrationError::AlreadyRegistered {
            member,
            roll_no: existing.roll_no,
        }
    }

    /// Files a pending club-membership application.
    pub async fn apply_membership(&self, member: Member) -> Result<Registered, RegistrationError> {
        let member = eligibility::normalize_member(member, 0)?;

        if let Some(key) = self.store.find_membership_conflict(&member).await? {
            return Err(RegistrationError::AlreadyApplied(key));
        }

        let registration = self
            .store
            .commit_registration(NewRegistration {
                kind: RegistrationKind::GeneralMembership,
                event_id: None,
                team_name: None,
                status: RegistrationStatus::Pending,
                members: vec![member],
            })
            .await
            .map_err(|e| match e {
                CommitError::DuplicateApplication(key) => RegistrationError::AlreadyApplied(key),
                CommitError::Store(e) => e.into(),
                other => StoreError::Corrupt(format!("unexpected commit outcome: {other}")).into(),
            })?;

        tracing::info!(
            registration_id = registration.id,
            "membership application received"
        );

        let emails = registration
            .leader()
            .filter(|m| !m.email.is_empty())
            .map(|m| templates::membership_received(&self.club_name, m))
            .into_iter()
            .collect();
        let emails = email::dispatch(self.mailer.clone(), emails);

        Ok(Registered {
            registration,
            emails,
        })
    }

    pub async fn membership_status(
        &self,
        roll_no: &str,
    ) -> Result<RegistrationStatus, RegistrationError> {
        let roll: RollNumber =
            roll_no
                .parse()
                .map_err(|source| RegistrationError::InvalidRollNo {
                    member: roll_no.trim().to_string(),
                    source,
                })?;

        self.store
            .find_membership(roll.as_str())
            .await?
            .map(|r| r.status)
            .ok_or(RegistrationError::ApplicationNotFound)
    }

    /// Emails every registrant of an event and waits for the sends.
    pub async fn announce(
        &self,
        event_id: i32,
        subject: &str,
        message: &str,
    ) -> Result<DispatchReport, RegistrationError> {
        if subject.trim().is_empty() || message.trim().is_empty() {
            return Err(RegistrationError::EmptyAnnouncement);
        }

        let event: Event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or(RegistrationError::NotFound)?;

        let registrations = self
            .store
            .list_registrations(&RegistrationFilter {
                event_id: Some(event.id),
                ..RegistrationFilter::default()
            })
            .await?;

        let emails = registrations
            .iter()
            .flat_map(|r| r.members.iter())
            .filter(|m| !m.email.is_empty())
            .unique_by(|m| m.email.to_ascii_lowercase())
            .map(|m| templates::announcement(&self.club_name, &event, m, subject.trim(), message))
            .collect();

        let report = email::dispatch(self.mailer.clone(), emails).settled().await;
        tracing::info!(
            event_id = event.id,
            sent = report.sent,
            failed = report.failed,
            "event announcement sent"
        );
        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{email::OutboxMailer, models::EventInput, store::MemoryStore};
    use chrono::Duration;

    pub(crate) struct Harness {
        pub registrar: Registrar,
        pub store: Arc<MemoryStore>,
        pub outbox: Arc<OutboxMailer>,
    }

    pub(crate) fn harness() -> Harness {
        let store = Arc::new(MemoryStore::default());
        let outbox = Arc::new(OutboxMailer::default());
        Harness {
            registrar: Registrar::new(store.clone(), outbox.clone(), "Coding Club"),
            store,
            outbox,
        }
    }

    pub(crate) fn event_input() -> EventInput {
        EventInput {
            title: "Code Sprint".to_string(),
            description: "24 hours of code".to_string(),
            venue: Some("Lab 3".to_string()),
            image_url: None,
            date: Utc::now() + Duration::days(10),
            deadline: Some(Utc::now() + Duration::days(5)),
            max_registrations: 0,
            is_team_event: false,
            min_team_size: 1,
            max_team_size: 1,
            registration_open: true,
            members_only: false,
            visible: true,
        }
    }

    pub(crate) fn member(name: &str, roll_no: &str) -> Member {
        Member {
            full_name: name.to_string(),
            roll_no: roll_no.to_string(),
            branch: "CSE".to_string(),
            section: "A".to_string(),
            email: format!("{}@college.edu", name.to_lowercase().replace(' ', ".")),
            phone: format!("987654{}", &roll_no[6..]),
        }
    }

    fn solo(m: Member) -> RegistrationForm {
        RegistrationForm {
            team_name: None,
            members: vec![m],
        }
    }

    #[tokio::test]
    async fn registers_and_confirms_each_member() {
        let h = harness();
        let event = h
            .store
            .create_event(EventInput {
                is_team_event: true,
                min_team_size: 2,
                max_team_size: 3,
                ..event_input()
            })
            .await
            .unwrap();

        let registered = h
            .registrar
            .register(
                event.id,
                RegistrationForm {
                    team_name: Some("Null Pointers".to_string()),
                    members: vec![member("Asha", "24891A0501"), member("Bala", "24891A0502")],
                },
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(registered.registration.status, RegistrationStatus::Approved);
        assert_eq!(registered.emails.settled().await.sent, 2);

        let event = h.store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(event.current_registrations, 2);
        let sent = h.outbox.sent();
        assert!(sent.iter().any(|e| e.to == "asha@college.edu"));
        assert!(sent.iter().all(|e| e.subject.contains("Code Sprint")));
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let h = harness();
        let err = h
            .registrar
            .register(42, solo(member("Asha", "24891A0501")), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::NotFound));
    }

    #[tokio::test]
    async fn second_registration_for_same_roll_number_fails() {
        let h = harness();
        let event = h.store.create_event(event_input()).await.unwrap();

        let first = h
            .registrar
            .register(event.id, solo(member("Asha", "24891A0501")), Utc::now())
            .await
            .unwrap();
        drop(first.emails);

        let err = h
            .registrar
            .register(event.id, solo(member("Asha Again", "24891a0501")), Utc::now())
            .await
            .unwrap_err();

        match err {
            RegistrationError::AlreadyRegistered { member, roll_no } => {
                assert_eq!(member, "Asha Again");
                assert_eq!(roll_no, "24891A0501");
            }
            other => panic!("unexpected error: {other}"),
        }
        let all = h
            .store
            .list_registrations(&RegistrationFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn team_with_one_registered_member_creates_nothing() {
        let h = harness();
        let event = h
            .store
            .create_event(EventInput {
                is_team_event: true,
                min_team_size: 2,
                max_team_size: 2,
                ..event_input()
            })
            .await
            .unwrap();

        h.registrar
            .register(
                event.id,
                RegistrationForm {
                    team_name: None,
                    members: vec![member("Asha", "24891A0501"), member("Bala", "24891A0502")],
                },
                Utc::now(),
            )
            .await
            .unwrap()
            .emails
            .settled()
            .await;

        let err = h
            .registrar
            .register(
                event.id,
                RegistrationForm {
                    team_name: None,
                    members: vec![member("Chitra", "24891A0503"), member("Bala", "24891A0502")],
                },
                Utc::now(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::AlreadyRegistered { member, .. } if member == "Bala"));
        let event = h.store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(event.current_registrations, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_attempts_on_last_seat() {
        let h = harness();
        let event = h
            .store
            .create_event(EventInput {
                max_registrations: 1,
                ..event_input()
            })
            .await
            .unwrap();

        let now = Utc::now();
        let (a, b) = tokio::join!(
            h.registrar
                .register(event.id, solo(member("Asha", "24891A0501")), now),
            h.registrar
                .register(event.id, solo(member("Bala", "24891A0502")), now),
        );

        let results = [a, b];
        let won = results.iter().filter(|r| r.is_ok()).count();
        let full = results
            .iter()
            .filter(|r| matches!(r, Err(RegistrationError::CapacityReached)))
            .count();
        assert_eq!((won, full), (1, 1));

        let event = h.store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(event.current_registrations, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_attempts_for_same_roll_number() {
        let h = harness();
        let event = h.store.create_event(event_input()).await.unwrap();

        let now = Utc::now();
        let (a, b) = tokio::join!(
            h.registrar
                .register(event.id, solo(member("Asha", "24891A0501")), now),
            h.registrar
                .register(event.id, solo(member("Asha Again", "24891a0501")), now),
        );

        let results = [a, b];
        let won = results.iter().filter(|r| r.is_ok()).count();
        let duplicate = results
            .iter()
            .filter(|r| {
                matches!(r, Err(RegistrationError::AlreadyRegistered { roll_no, .. }) if roll_no == "24891A0501")
            })
            .count();
        assert_eq!((won, duplicate), (1, 1));

        let event = h.store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(event.current_registrations, 1);
        let all = h
            .store
            .list_registrations(&RegistrationFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn roster_check_only_applies_to_teams() {
        let h = harness();
        let individual = h
            .store
            .create_event(EventInput {
                members_only: true,
                ..event_input()
            })
            .await
            .unwrap();
        h.registrar
            .register(individual.id, solo(member("Asha", "24891A0501")), Utc::now())
            .await
            .unwrap();

        let team = h
            .store
            .create_event(EventInput {
                members_only: true,
                is_team_event: true,
                min_team_size: 2,
                max_team_size: 2,
                ..event_input()
            })
            .await
            .unwrap();
        let err = h
            .registrar
            .register(
                team.id,
                RegistrationForm {
                    team_name: None,
                    members: vec![member("Asha", "24891A0501"), member("Bala", "24891A0502")],
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn membership_phone_matches_across_formats() {
        let h = harness();
        let mut first = member("Asha", "24891A0501");
        first.phone = "9876543210".to_string();
        h.registrar
            .apply_membership(first)
            .await
            .unwrap()
            .emails
            .settled()
            .await;

        let mut second = member("Bala", "24891A0502");
        second.phone = "+91 98765 43210".to_string();
        let err = h.registrar.apply_membership(second).await.unwrap_err();
        assert!(matches!(err, RegistrationError::AlreadyApplied(MembershipKey::Phone)));
    }

    #[tokio::test]
    async fn email_failure_does_not_undo_registration() {
        let h = harness();
        let event = h.store.create_event(event_input()).await.unwrap();
        h.outbox.refuse("asha@college.edu");

        let registered = h
            .registrar
            .register(event.id, solo(member("Asha", "24891A0501")), Utc::now())
            .await
            .unwrap();

        assert_eq!(registered.emails.settled().await.failed, 1);
        assert!(h
            .store
            .get_registration(registered.registration.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn membership_application_is_pending_and_unique() {
        let h = harness();
        let applied = h
            .registrar
            .apply_membership(member("Asha", "24891A0501"))
            .await
            .unwrap();
        assert_eq!(applied.registration.status, RegistrationStatus::Pending);
        assert_eq!(applied.registration.kind, RegistrationKind::GeneralMembership);
        assert_eq!(applied.emails.settled().await.sent, 1);

        let mut same_phone = member("Bala", "24891A0502");
        same_phone.phone = member("Asha", "24891A0501").phone;
        let err = h.registrar.apply_membership(same_phone).await.unwrap_err();
        assert!(matches!(err, RegistrationError::AlreadyApplied(MembershipKey::Phone)));

        assert_eq!(
            h.registrar.membership_status("24891a0501").await.unwrap(),
            RegistrationStatus::Pending
        );
        assert!(matches!(
            h.registrar.membership_status("24891A0599").await,
            Err(RegistrationError::ApplicationNotFound)
        ));
    }

    #[tokio::test]
    async fn announcement_reaches_each_address_once() {
        let h = harness();
        let event = h
            .store
            .create_event(EventInput {
                is_team_event: true,
                min_team_size: 1,
                max_team_size: 2,
                ..event_input()
            })
            .await
            .unwrap();
        h.registrar
            .register(
                event.id,
                RegistrationForm {
                    team_name: None,
                    members: vec![member("Asha", "24891A0501"), member("Bala", "24891A0502")],
                },
                Utc::now(),
            )
            .await
            .unwrap()
            .emails
            .settled()
            .await;

        let report = h
            .registrar
            .announce(event.id, "Venue change", "We moved to Lab 5.")
            .await
            .unwrap();

        assert_eq!(report, DispatchReport { sent: 2, failed: 0 });
        assert!(matches!(
            h.registrar.announce(event.id, " ", "body").await,
            Err(RegistrationError::EmptyAnnouncement)
        ));
    }
}
