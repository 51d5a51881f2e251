use super::{CommitError, MembershipKey, Store, StoreResult, Transition};
use crate::models::{
    Event, EventInput, GalleryInput, GalleryItem, Member, NewRegistration, Popup, PopupInput,
    Registration, RegistrationFilter, RegistrationKind, RegistrationStatus, RosterEntry,
    RosterInput, Stats,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Process-local store. Every operation runs under one lock, which gives
/// the same atomicity the Postgres store gets from its transaction and
/// unique indexes.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    next_id: i32,
    events: BTreeMap<i32, Event>,
    registrations: BTreeMap<i32, Registration>,
    roster: BTreeMap<i32, RosterEntry>,
    popups: BTreeMap<i32, Popup>,
    gallery: BTreeMap<i32, GalleryItem>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn memberships(&self) -> impl Iterator<Item = &Registration> {
        self.registrations
            .values()
            .filter(|r| r.kind == RegistrationKind::GeneralMembership)
    }

    fn membership_conflict(&self, member: &Member) -> Option<MembershipKey> {
        self.memberships()
            .flat_map(|r| r.members.iter())
            .find_map(|existing| {
                if existing.roll_no == member.roll_no {
                    Some(MembershipKey::RollNo)
                } else if existing.email.eq_ignore_ascii_case(&member.email) {
                    Some(MembershipKey::Email)
                } else if existing.phone == member.phone {
                    Some(MembershipKey::Phone)
                } else {
                    None
                }
            })
    }

    fn event_registrant(&self, event_id: i32, roll_nos: &[String]) -> Option<Member> {
        self.registrations
            .values()
            .filter(|r| r.event_id == Some(event_id))
            .flat_map(|r| r.members.iter())
            .find(|m| roll_nos.contains(&m.roll_no))
            .cloned()
    }
}

fn event_from_input(
    id: i32,
    current_registrations: i32,
    input: EventInput,
    created_at: chrono::DateTime<Utc>,
) -> Event {
    Event {
        id,
        title: input.title,
        description: input.description,
        venue: input.venue,
        image_url: input.image_url,
        date: input.date,
        deadline: input.deadline,
        max_registrations: input.max_registrations,
        current_registrations,
        is_team_event: input.is_team_event,
        min_team_size: input.min_team_size,
        max_team_size: input.max_team_size,
        registration_open: input.registration_open,
        members_only: input.members_only,
        visible: input.visible,
        created_at,
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list_events(&self, include_hidden: bool) -> StoreResult<Vec<Event>> {
        let tables = self.inner.lock().await;
        let mut events: Vec<_> = tables
            .events
            .values()
            .filter(|e| include_hidden || e.visible)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(events)
    }

    async fn get_event(&self, id: i32) -> StoreResult<Option<Event>> {
        Ok(self.inner.lock().await.events.get(&id).cloned())
    }

    async fn create_event(&self, input: EventInput) -> StoreResult<Event> {
        let mut tables = self.inner.lock().await;
        let id = tables.next_id();
        let event = event_from_input(id, 0, input, Utc::now());
        tables.events.insert(id, event.clone());
        Ok(event)
    }

    async fn update_event(&self, id: i32, input: EventInput) -> StoreResult<Option<Event>> {
        let mut tables = self.inner.lock().await;
        let Some(existing) = tables.events.get_mut(&id) else {
            return Ok(None);
        };
        *existing = event_from_input(id, existing.current_registrations, input, existing.created_at);
        Ok(Some(existing.clone()))
    }

    async fn set_registration_open(&self, id: i32, open: bool) -> StoreResult<Option<Event>> {
        let mut tables = self.inner.lock().await;
        Ok(tables.events.get_mut(&id).map(|event| {
            event.registration_open = open;
            event.clone()
        }))
    }

    async fn delete_event(&self, id: i32) -> StoreResult<bool> {
        let mut tables = self.inner.lock().await;
        if tables.events.remove(&id).is_none() {
            return Ok(false);
        }
        tables.registrations.retain(|_, r| r.event_id != Some(id));
        for item in tables.gallery.values_mut() {
            if item.event_id == Some(id) {
                item.event_id = None;
            }
        }
        Ok(true)
    }

    async fn find_event_registrant(
        &self,
        event_id: i32,
        roll_nos: &[String],
    ) -> StoreResult<Option<Member>> {
        Ok(self.inner.lock().await.event_registrant(event_id, roll_nos))
    }

    async fn find_membership_conflict(
        &self,
        member: &Member,
    ) -> StoreResult<Option<MembershipKey>> {
        Ok(self.inner.lock().await.membership_conflict(member))
    }

    async fn find_membership(&self, roll_no: &str) -> StoreResult<Option<Registration>> {
        let tables = self.inner.lock().await;
        let found = tables
            .memberships()
            .find(|r| r.members.iter().any(|m| m.roll_no == roll_no))
            .cloned();
        Ok(found)
    }

    async fn commit_registration(&self, new: NewRegistration) -> Result<Registration, CommitError> {
        let mut tables = self.inner.lock().await;
        let seats = new.members.len() as i32;

        match new.kind {
            RegistrationKind::Event => {
                let event_id = new.event_id.ok_or(CommitError::EventNotFound)?;
                let roll_nos: Vec<_> = new.members.iter().map(|m| m.roll_no.clone()).collect();
                if tables.event_registrant(event_id, &roll_nos).is_some() {
                    return Err(CommitError::DuplicateMember);
                }
                let event = tables
                    .events
                    .get_mut(&event_id)
                    .ok_or(CommitError::EventNotFound)?;
                if event.max_registrations != 0
                    && event.current_registrations + seats > event.max_registrations
                {
                    return Err(CommitError::CapacityReached);
                }
                event.current_registrations += seats;
            }
            RegistrationKind::GeneralMembership => {
                if let Some(key) = new
                    .members
                    .iter()
                    .find_map(|m| tables.membership_conflict(m))
                {
                    return Err(CommitError::DuplicateApplication(key));
                }
            }
        }

        let id = tables.next_id();
        let registration = Registration {
            id,
            kind: new.kind,
            event_id: new.event_id,
            team_name: new.team_name,
            status: new.status,
            members: new.members,
            created_at: Utc::now(),
        };
        tables.registrations.insert(id, registration.clone());
        Ok(registration)
    }

    async fn get_registration(&self, id: i32) -> StoreResult<Option<Registration>> {
        Ok(self.inner.lock().await.registrations.get(&id).cloned())
    }

    async fn list_registrations(
        &self,
        filter: &RegistrationFilter,
    ) -> StoreResult<Vec<Registration>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .registrations
            .values()
            .rev()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn transition_status(&self, id: i32, to: RegistrationStatus) -> StoreResult<Transition> {
        let mut tables = self.inner.lock().await;
        let Some(registration) = tables.registrations.get_mut(&id) else {
            return Ok(Transition::Missing);
        };
        if registration.status != RegistrationStatus::Pending {
            return Ok(Transition::Unchanged(registration.clone()));
        }
        registration.status = to;
        Ok(Transition::Applied(registration.clone()))
    }

    async fn delete_registration(&self, id: i32) -> StoreResult<Option<Registration>> {
        let mut tables = self.inner.lock().await;
        let Some(registration) = tables.registrations.remove(&id) else {
            return Ok(None);
        };
        if let Some(event) = registration
            .event_id
            .and_then(|event_id| tables.events.get_mut(&event_id))
        {
            event.current_registrations =
                (event.current_registrations - registration.seats()).max(0);
        }
        Ok(Some(registration))
    }

    async fn stats(&self) -> StoreResult<Stats> {
        let tables = self.inner.lock().await;
        let count_memberships = |status| {
            tables
                .memberships()
                .filter(|r| r.status == status)
                .count() as i64
        };
        Ok(Stats {
            events: tables.events.len() as i64,
            open_events: tables.events.values().filter(|e| e.registration_open).count() as i64,
            event_registrations: tables
                .registrations
                .values()
                .filter(|r| r.kind == RegistrationKind::Event)
                .count() as i64,
            pending_applications: count_memberships(RegistrationStatus::Pending),
            members: count_memberships(RegistrationStatus::Approved),
        })
    }

    async fn list_roster(&self) -> StoreResult<Vec<RosterEntry>> {
        let tables = self.inner.lock().await;
        let mut roster: Vec<_> = tables.roster.values().cloned().collect();
        roster.sort_by_key(|r| (r.display_order, r.id));
        Ok(roster)
    }

    async fn create_roster_entry(&self, input: RosterInput) -> StoreResult<RosterEntry> {
        let mut tables = self.inner.lock().await;
        let id = tables.next_id();
        let entry = RosterEntry {
            id,
            name: input.name,
            role: input.role,
            image_url: input.image_url,
            linkedin: input.linkedin,
            github: input.github,
            display_order: input.display_order,
        };
        tables.roster.insert(id, entry.clone());
        Ok(entry)
    }

    async fn update_roster_entry(
        &self,
        id: i32,
        input: RosterInput,
    ) -> StoreResult<Option<RosterEntry>> {
        let mut tables = self.inner.lock().await;
        Ok(tables.roster.get_mut(&id).map(|entry| {
            entry.name = input.name;
            entry.role = input.role;
            entry.image_url = input.image_url;
            entry.linkedin = input.linkedin;
            entry.github = input.github;
            entry.display_order = input.display_order;
            entry.clone()
        }))
    }

    async fn delete_roster_entry(&self, id: i32) -> StoreResult<bool> {
        Ok(self.inner.lock().await.roster.remove(&id).is_some())
    }

    async fn list_popups(&self, active_only: bool) -> StoreResult<Vec<Popup>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .popups
            .values()
            .rev()
            .filter(|p| !active_only || p.active)
            .cloned()
            .collect())
    }

    async fn create_popup(&self, input: PopupInput) -> StoreResult<Popup> {
        let mut tables = self.inner.lock().await;
        let id = tables.next_id();
        let popup = Popup {
            id,
            title: input.title,
            message: input.message,
            image_url: input.image_url,
            link: input.link,
            active: input.active,
            created_at: Utc::now(),
        };
        tables.popups.insert(id, popup.clone());
        Ok(popup)
    }

    async fn update_popup(&self, id: i32, input: PopupInput) -> StoreResult<Option<Popup>> {
        let mut tables = self.inner.lock().await;
        Ok(tables.popups.get_mut(&id).map(|popup| {
            popup.title = input.title;
            popup.message = input.message;
            popup.image_url = input.image_url;
            popup.link = input.link;
            popup.active = input.active;
            popup.clone()
        }))
    }

    async fn delete_popup(&self, id: i32) -> StoreResult<bool> {
        Ok(self.inner.lock().await.popups.remove(&id).is_some())
    }

    async fn list_gallery(&self, event_id: Option<i32>) -> StoreResult<Vec<GalleryItem>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .gallery
            .values()
            .rev()
            .filter(|g| event_id.map_or(true, |id| g.event_id == Some(id)))
            .cloned()
            .collect())
    }

    async fn create_gallery_item(&self, input: GalleryInput) -> StoreResult<GalleryItem> {
        let mut tables = self.inner.lock().await;
        let id = tables.next_id();
        let item = GalleryItem {
            id,
            title: input.title,
            image_url: input.image_url,
            event_id: input.event_id,
            created_at: Utc::now(),
        };
        tables.gallery.insert(id, item.clone());
        Ok(item)
    }

    async fn delete_gallery_item(&self, id: i32) -> StoreResult<bool> {
        Ok(self.inner.lock().await.gallery.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event_input(max_registrations: i32) -> EventInput {
        EventInput {
            title: "Hackathon".to_string(),
            description: String::new(),
            venue: None,
            image_url: None,
            date: Utc::now() + Duration::days(7),
            deadline: None,
            max_registrations,
            is_team_event: false,
            min_team_size: 1,
            max_team_size: 1,
            registration_open: true,
            members_only: false,
            visible: true,
        }
    }

    fn member(roll_no: &str) -> Member {
        Member {
            full_name: "Asha".to_string(),
            roll_no: roll_no.to_string(),
            branch: "CSE".to_string(),
            section: "A".to_string(),
            email: format!("{roll_no}@college.edu"),
            phone: "9876543210".to_string(),
        }
    }

    fn event_registration(event_id: i32, members: Vec<Member>) -> NewRegistration {
        NewRegistration {
            kind: RegistrationKind::Event,
            event_id: Some(event_id),
            team_name: None,
            status: RegistrationStatus::Approved,
            members,
        }
    }

    #[tokio::test]
    async fn commit_claims_one_seat_per_member() {
        let store = MemoryStore::default();
        let event = store.create_event(event_input(3)).await.unwrap();

        store
            .commit_registration(event_registration(
                event.id,
                vec![member("24891A0501"), member("24891A0502")],
            ))
            .await
            .unwrap();
        let err = store
            .commit_registration(event_registration(
                event.id,
                vec![member("24891A0503"), member("24891A0504")],
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, CommitError::CapacityReached));
        let event = store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(event.current_registrations, 2);
    }

    #[tokio::test]
    async fn delete_releases_seats() {
        let store = MemoryStore::default();
        let event = store.create_event(event_input(1)).await.unwrap();
        let registration = store
            .commit_registration(event_registration(event.id, vec![member("24891A0501")]))
            .await
            .unwrap();

        store.delete_registration(registration.id).await.unwrap();

        let event = store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(event.current_registrations, 0);
    }

    #[tokio::test]
    async fn membership_email_is_unique_ignoring_case() {
        let store = MemoryStore::default();
        let first = member("24891A0501");
        store
            .commit_registration(NewRegistration {
                kind: RegistrationKind::GeneralMembership,
                event_id: None,
                team_name: None,
                status: RegistrationStatus::Pending,
                members: vec![first.clone()],
            })
            .await
            .unwrap();

        let mut second = member("24891A0502");
        second.email = first.email.to_uppercase();
        second.phone = "9000000000".to_string();

        assert_eq!(
            store.find_membership_conflict(&second).await.unwrap(),
            Some(MembershipKey::Email)
        );
    }

    #[tokio::test]
    async fn finds_membership_by_roll_number_only() {
        let store = MemoryStore::default();
        let event = store.create_event(event_input(0)).await.unwrap();
        store
            .commit_registration(event_registration(event.id, vec![member("24891A0502")]))
            .await
            .unwrap();
        let applied = store
            .commit_registration(NewRegistration {
                kind: RegistrationKind::GeneralMembership,
                event_id: None,
                team_name: None,
                status: RegistrationStatus::Pending,
                members: vec![member("24891A0501")],
            })
            .await
            .unwrap();

        let found = store.find_membership("24891A0501").await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(applied.id));
        // event registrants are not club members
        assert_eq!(store.find_membership("24891A0502").await.unwrap(), None);
    }

    #[tokio::test]
    async fn transition_only_leaves_pending() {
        let store = MemoryStore::default();
        let registration = store
            .commit_registration(NewRegistration {
                kind: RegistrationKind::GeneralMembership,
                event_id: None,
                team_name: None,
                status: RegistrationStatus::Pending,
                members: vec![member("24891A0501")],
            })
            .await
            .unwrap();

        let first = store
            .transition_status(registration.id, RegistrationStatus::Approved)
            .await
            .unwrap();
        let second = store
            .transition_status(registration.id, RegistrationStatus::Rejected)
            .await
            .unwrap();

        assert!(matches!(first, Transition::Applied(r) if r.status == RegistrationStatus::Approved));
        assert!(matches!(second, Transition::Unchanged(r) if r.status == RegistrationStatus::Approved));
        assert_eq!(
            store.transition_status(999, RegistrationStatus::Approved).await.unwrap(),
            Transition::Missing
        );
    }
}
