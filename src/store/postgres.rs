use super::{CommitError, MembershipKey, Store, StoreError, StoreResult, Transition};
use crate::{
    models::{
        Event, EventInput, GalleryInput, GalleryItem, Member, NewRegistration, Popup, PopupInput,
        Registration, RegistrationFilter, RegistrationKind, RegistrationStatus, RosterEntry,
        RosterInput, Stats,
    },
    schema::*,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool::managed::{Object, Pool};
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use diesel_async::{
    pooled_connection::AsyncDieselConnectionManager, AsyncConnection, AsyncPgConnection,
    RunQueryDsl,
};
use itertools::Itertools;
use scoped_futures::ScopedFutureExt;
use std::collections::HashMap;

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

const EVENT_ROLL_NO_KEY: &str = "registration_members_event_roll_no_key";
const MEMBERSHIP_ROLL_NO_KEY: &str = "registration_members_membership_roll_no_key";
const MEMBERSHIP_EMAIL_KEY: &str = "registration_members_membership_email_key";
const MEMBERSHIP_PHONE_KEY: &str = "registration_members_membership_phone_key";

pub fn connect_to_db(db_url: &str) -> anyhow::Result<DbPool> {
    let db_config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
    Pool::builder(db_config)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build database pool: {e}"))
}

#[derive(Debug, Queryable)]
struct RegistrationRow {
    id: i32,
    kind: String,
    event_id: Option<i32>,
    team_name: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Queryable)]
#[allow(dead_code)]
struct MemberRow {
    id: i32,
    registration_id: i32,
    event_id: Option<i32>,
    kind: String,
    position: i32,
    full_name: String,
    roll_no: String,
    branch: String,
    section: String,
    email: String,
    phone: String,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Member {
            full_name: row.full_name,
            roll_no: row.roll_no,
            branch: row.branch,
            section: row.section,
            email: row.email,
            phone: row.phone,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = registrations)]
struct NewRegistrationRow<'a> {
    kind: &'a str,
    event_id: Option<i32>,
    team_name: Option<&'a str>,
    status: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = registration_members)]
struct NewMemberRow<'a> {
    registration_id: i32,
    event_id: Option<i32>,
    kind: &'a str,
    position: i32,
    full_name: &'a str,
    roll_no: &'a str,
    branch: &'a str,
    section: &'a str,
    email: &'a str,
    phone: &'a str,
}

fn into_registration(row: RegistrationRow, members: Vec<Member>) -> StoreResult<Registration> {
    Ok(Registration {
        id: row.id,
        kind: row
            .kind
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("registration {}: {e}", row.id)))?,
        event_id: row.event_id,
        team_name: row.team_name,
        status: row
            .status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("registration {}: {e}", row.id)))?,
        members,
        created_at: row.created_at,
    })
}

impl From<DieselError> for CommitError {
    fn from(e: DieselError) -> Self {
        if let DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) = &e {
            match info.constraint_name() {
                Some(EVENT_ROLL_NO_KEY) => return CommitError::DuplicateMember,
                Some(MEMBERSHIP_ROLL_NO_KEY) => {
                    return CommitError::DuplicateApplication(MembershipKey::RollNo)
                }
                Some(MEMBERSHIP_EMAIL_KEY) => {
                    return CommitError::DuplicateApplication(MembershipKey::Email)
                }
                Some(MEMBERSHIP_PHONE_KEY) => {
                    return CommitError::DuplicateApplication(MembershipKey::Phone)
                }
                _ => {}
            }
        }
        CommitError::Store(StoreError::Database(e))
    }
}

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StoreResult<Object<AsyncDieselConnectionManager<AsyncPgConnection>>> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

async fn load_registrations(
    conn: &mut AsyncPgConnection,
    rows: Vec<RegistrationRow>,
) -> StoreResult<Vec<Registration>> {
    let mut members: HashMap<i32, Vec<MemberRow>> = registration_members::table
        .filter(registration_members::registration_id.eq_any(rows.iter().map(|r| r.id)))
        .order((
            registration_members::registration_id,
            registration_members::position,
        ))
        .load::<MemberRow>(conn)
        .await?
        .into_iter()
        .into_group_map_by(|m| m.registration_id);

    rows.into_iter()
        .map(|row| {
            let members = members
                .remove(&row.id)
                .unwrap_or_default()
                .into_iter()
                .map(Member::from)
                .collect();
            into_registration(row, members)
        })
        .collect()
}

async fn load_registration(
    conn: &mut AsyncPgConnection,
    id: i32,
) -> StoreResult<Option<Registration>> {
    let Some(row) = registrations::table
        .find(id)
        .first::<RegistrationRow>(conn)
        .await
        .optional()?
    else {
        return Ok(None);
    };
    Ok(load_registrations(conn, vec![row]).await?.pop())
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn list_events(&self, include_hidden: bool) -> StoreResult<Vec<Event>> {
        let conn = &mut self.conn().await?;

        let mut query = events::table.into_boxed();
        if !include_hidden {
            query = query.filter(events::visible.eq(true));
        }
        Ok(query.order(events::date.desc()).load::<Event>(conn).await?)
    }

    async fn get_event(&self, id: i32) -> StoreResult<Option<Event>> {
        let conn = &mut self.conn().await?;

        Ok(events::table
            .find(id)
            .first::<Event>(conn)
            .await
            .optional()?)
    }

    async fn create_event(&self, input: EventInput) -> StoreResult<Event> {
        let conn = &mut self.conn().await?;

        Ok(diesel::insert_into(events::table)
            .values(&input)
            .get_result::<Event>(conn)
            .await?)
    }

    async fn update_event(&self, id: i32, input: EventInput) -> StoreResult<Option<Event>> {
        let conn = &mut self.conn().await?;

        Ok(diesel::update(events::table.find(id))
            .set(&input)
            .get_result::<Event>(conn)
            .await
            .optional()?)
    }

    async fn set_registration_open(&self, id: i32, open: bool) -> StoreResult<Option<Event>> {
        let conn = &mut self.conn().await?;

        Ok(diesel::update(events::table.find(id))
            .set(events::registration_open.eq(open))
            .get_result::<Event>(conn)
            .await
            .optional()?)
    }

    async fn delete_event(&self, id: i32) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;

        let deleted = diesel::delete(events::table.find(id))
            .execute(conn)
            .await?;
        Ok(deleted > 0)
    }

    async fn find_event_registrant(
        &self,
        event_id: i32,
        roll_nos: &[String],
    ) -> StoreResult<Option<Member>> {
        let conn = &mut self.conn().await?;

        Ok(registration_members::table
            .filter(registration_members::event_id.eq(event_id))
            .filter(registration_members::kind.eq(RegistrationKind::Event.as_str()))
            .filter(registration_members::roll_no.eq_any(roll_nos.to_vec()))
            .order(registration_members::id)
            .first::<MemberRow>(conn)
            .await
            .optional()?
            .map(Member::from))
    }

    async fn find_membership_conflict(
        &self,
        member: &Member,
    ) -> StoreResult<Option<MembershipKey>> {
        let conn = &mut self.conn().await?;

        let existing = registration_members::table
            .filter(registration_members::kind.eq(RegistrationKind::GeneralMembership.as_str()))
            .filter(
                registration_members::roll_no
                    .eq(&member.roll_no)
                    .or(registration_members::email.eq(&member.email))
                    .or(registration_members::phone.eq(&member.phone)),
            )
            .load::<MemberRow>(conn)
            .await?;

        let key = if existing.iter().any(|m| m.roll_no == member.roll_no) {
            Some(MembershipKey::RollNo)
        } else if existing.iter().any(|m| m.email == member.email) {
            Some(MembershipKey::Email)
        } else if existing.is_empty() {
            None
        } else {
            Some(MembershipKey::Phone)
        };
        Ok(key)
    }

    async fn find_membership(&self, roll_no: &str) -> StoreResult<Option<Registration>> {
        let conn = &mut self.conn().await?;

        let registration_id = registration_members::table
            .filter(registration_members::kind.eq(RegistrationKind::GeneralMembership.as_str()))
            .filter(registration_members::roll_no.eq(roll_no))
            .select(registration_members::registration_id)
            .first::<i32>(conn)
            .await
            .optional()?;

        match registration_id {
            Some(id) => load_registration(conn, id).await,
            None => Ok(None),
        }
    }

    async fn commit_registration(&self, new: NewRegistration) -> Result<Registration, CommitError> {
        let mut pooled = self.conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let row = conn
            .transaction::<_, CommitError, _>(|conn| {
                let new = &new;
                async move {
                    if new.kind == RegistrationKind::Event {
                        let event_id = new.event_id.ok_or(CommitError::EventNotFound)?;
                        let seats = new.members.len() as i32;

                        // claim the seats only while they are still free
                        let claimed = diesel::update(
                            events::table.filter(events::id.eq(event_id)).filter(
                                events::max_registrations.eq(0).or((events::current_registrations
                                    + seats)
                                    .le(events::max_registrations)),
                            ),
                        )
                        .set(events::current_registrations.eq(events::current_registrations + seats))
                        .execute(conn)
                        .await?;

                        if claimed == 0 {
                            let exists = events::table
                                .find(event_id)
                                .select(events::id)
                                .first::<i32>(conn)
                                .await
                                .optional()?
                                .is_some();
                            return Err(if exists {
                                CommitError::CapacityReached
                            } else {
                                CommitError::EventNotFound
                            });
                        }
                    }

                    let row = diesel::insert_into(registrations::table)
                        .values(NewRegistrationRow {
                            kind: new.kind.as_str(),
                            event_id: new.event_id,
                            team_name: new.team_name.as_deref(),
                            status: new.status.as_str(),
                        })
                        .get_result::<RegistrationRow>(conn)
                        .await?;

                    let member_rows: Vec<_> = new
                        .members
                        .iter()
                        .enumerate()
                        .map(|(position, m)| NewMemberRow {
                            registration_id: row.id,
                            event_id: new.event_id,
                            kind: new.kind.as_str(),
                            position: position as i32,
                            full_name: &m.full_name,
                            roll_no: &m.roll_no,
                            branch: &m.branch,
                            section: &m.section,
                            email: &m.email,
                            phone: &m.phone,
                        })
                        .collect();

                    diesel::insert_into(registration_members::table)
                        .values(&member_rows)
                        .execute(conn)
                        .await?;

                    Ok(row)
                }
                .scope_boxed()
            })
            .await?;

        Ok(into_registration(row, new.members)?)
    }

    async fn get_registration(&self, id: i32) -> StoreResult<Option<Registration>> {
        let conn = &mut self.conn().await?;
        load_registration(conn, id).await
    }

    async fn list_registrations(
        &self,
        filter: &RegistrationFilter,
    ) -> StoreResult<Vec<Registration>> {
        let conn = &mut self.conn().await?;

        let mut query = registrations::table.into_boxed();
        if let Some(event_id) = filter.event_id {
            query = query.filter(registrations::event_id.eq(event_id));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(registrations::kind.eq(kind.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(registrations::status.eq(status.as_str()));
        }

        let rows = query
            .order(registrations::id.desc())
            .load::<RegistrationRow>(conn)
            .await?;
        load_registrations(conn, rows).await
    }

    async fn transition_status(&self, id: i32, to: RegistrationStatus) -> StoreResult<Transition> {
        let conn = &mut self.conn().await?;

        let updated = diesel::update(
            registrations::table
                .filter(registrations::id.eq(id))
                .filter(registrations::status.eq(RegistrationStatus::Pending.as_str())),
        )
        .set(registrations::status.eq(to.as_str()))
        .execute(conn)
        .await?;

        Ok(match load_registration(conn, id).await? {
            None => Transition::Missing,
            Some(registration) if updated > 0 => Transition::Applied(registration),
            Some(registration) => Transition::Unchanged(registration),
        })
    }

    async fn delete_registration(&self, id: i32) -> StoreResult<Option<Registration>> {
        let mut pooled = self.conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let Some(registration) = load_registration(conn, id).await? else {
                    return Ok(None);
                };

                diesel::delete(registrations::table.find(id))
                    .execute(conn)
                    .await?;

                if let Some(event_id) = registration.event_id {
                    let seats = registration.seats();
                    let released = diesel::update(
                        events::table
                            .filter(events::id.eq(event_id))
                            .filter(events::current_registrations.ge(seats)),
                    )
                    .set(events::current_registrations.eq(events::current_registrations - seats))
                    .execute(conn)
                    .await?;

                    if released == 0 {
                        diesel::update(events::table.find(event_id))
                            .set(events::current_registrations.eq(0))
                            .execute(conn)
                            .await?;
                    }
                }

                Ok(Some(registration))
            }
            .scope_boxed()
        })
        .await
    }

    async fn stats(&self) -> StoreResult<Stats> {
        let conn = &mut self.conn().await?;

        let memberships = |status: RegistrationStatus| {
            registrations::table
                .filter(registrations::kind.eq(RegistrationKind::GeneralMembership.as_str()))
                .filter(registrations::status.eq(status.as_str()))
                .count()
        };

        Ok(Stats {
            events: events::table.count().get_result(conn).await?,
            open_events: events::table
                .filter(events::registration_open.eq(true))
                .count()
                .get_result(conn)
                .await?,
            event_registrations: registrations::table
                .filter(registrations::kind.eq(RegistrationKind::Event.as_str()))
                .count()
                .get_result(conn)
                .await?,
            pending_applications: memberships(RegistrationStatus::Pending)
                .get_result(conn)
                .await?,
            members: memberships(RegistrationStatus::Approved)
                .get_result(conn)
                .await?,
        })
    }

    async fn list_roster(&self) -> StoreResult<Vec<RosterEntry>> {
        let conn = &mut self.conn().await?;

        Ok(roster_entries::table
            .order((roster_entries::display_order, roster_entries::id))
            .load::<RosterEntry>(conn)
            .await?)
    }

    async fn create_roster_entry(&self, input: RosterInput) -> StoreResult<RosterEntry> {
        let conn = &mut self.conn().await?;

        Ok(diesel::insert_into(roster_entries::table)
            .values(&input)
            .get_result::<RosterEntry>(conn)
            .await?)
    }

    async fn update_roster_entry(
        &self,
        id: i32,
        input: RosterInput,
    ) -> StoreResult<Option<RosterEntry>> {
        let conn = &mut self.conn().await?;

        Ok(diesel::update(roster_entries::table.find(id))
            .set(&input)
            .get_result::<RosterEntry>(conn)
            .await
            .optional()?)
    }

    async fn delete_roster_entry(&self, id: i32) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;

        let deleted = diesel::delete(roster_entries::table.find(id))
            .execute(conn)
            .await?;
        Ok(deleted > 0)
    }

    async fn list_popups(&self, active_only: bool) -> StoreResult<Vec<Popup>> {
        let conn = &mut self.conn().await?;

        let mut query = popups::table.into_boxed();
        if active_only {
            query = query.filter(popups::active.eq(true));
        }
        Ok(query.order(popups::id.desc()).load::<Popup>(conn).await?)
    }

    async fn create_popup(&self, input: PopupInput) -> StoreResult<Popup> {
        let conn = &mut self.conn().await?;

        Ok(diesel::insert_into(popups::table)
            .values(&input)
            .get_result::<Popup>(conn)
            .await?)
    }

    async fn update_popup(&self, id: i32, input: PopupInput) -> StoreResult<Option<Popup>> {
        let conn = &mut self.conn().await?;

        Ok(diesel::update(popups::table.find(id))
            .set(&input)
            .get_result::<Popup>(conn)
            .await
            .optional()?)
    }

    async fn delete_popup(&self, id: i32) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;

        let deleted = diesel::delete(popups::table.find(id)).execute(conn).await?;
        Ok(deleted > 0)
    }

    async fn list_gallery(&self, event_id: Option<i32>) -> StoreResult<Vec<GalleryItem>> {
        let conn = &mut self.conn().await?;

        let mut query = gallery_items::table.into_boxed();
        if let Some(event_id) = event_id {
            query = query.filter(gallery_items::event_id.eq(event_id));
        }
        Ok(query
            .order(gallery_items::id.desc())
            .load::<GalleryItem>(conn)
            .await?)
    }

    async fn create_gallery_item(&self, input: GalleryInput) -> StoreResult<GalleryItem> {
        let conn = &mut self.conn().await?;

        Ok(diesel::insert_into(gallery_items::table)
            .values(&input)
            .get_result::<GalleryItem>(conn)
            .await?)
    }

    async fn delete_gallery_item(&self, id: i32) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;

        let deleted = diesel::delete(gallery_items::table.find(id))
            .execute(conn)
            .await?;
        Ok(deleted > 0)
    }
}
