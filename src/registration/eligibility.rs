//! Checks that need nothing but the event and the submitted form.

use super::{RegistrationError, RegistrationForm};
use crate::{models::Event, models::Member, roll_no::validate_roll_no};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use lettre::Address;

/// Event-level preconditions, in the order they are reported.
pub fn check_open(event: &Event, now: DateTime<Utc>) -> Result<(), RegistrationError> {
    if !event.registration_open {
        return Err(RegistrationError::Closed);
    }
    if event.deadline.map_or(false, |deadline| now > deadline) {
        return Err(RegistrationError::DeadlinePassed);
    }
    if now > event.date {
        return Err(RegistrationError::EventEnded);
    }
    if event.is_full() {
        return Err(RegistrationError::CapacityReached);
    }
    Ok(())
}

/// Builds the validated member list for `event` from the form.
pub fn assemble(
    event: &Event,
    form: RegistrationForm,
) -> Result<(Option<String>, Vec<Member>), RegistrationError> {
    let RegistrationForm { team_name, members } = form;

    if !event.is_team_event {
        if members.len() > 1 {
            return Err(RegistrationError::TeamSizeInvalid {
                min: 1,
                max: 1,
                actual: members.len(),
            });
        }
        let member = members
            .into_iter()
            .next()
            .ok_or(RegistrationError::MissingMember)?;
        return Ok((None, vec![normalize_member(member, 0)?]));
    }

    let (min, max) = (event.min_team_size as usize, event.max_team_size as usize);
    if members.len() < min || members.len() > max {
        return Err(RegistrationError::TeamSizeInvalid {
            min,
            max,
            actual: members.len(),
        });
    }

    if let Some(roll_no) = members
        .iter()
        .map(|m| m.roll_no.trim().to_ascii_uppercase())
        .duplicates()
        .next()
    {
        return Err(RegistrationError::DuplicateInTeam(roll_no));
    }

    let members = members
        .into_iter()
        .enumerate()
        .map(|(i, m)| normalize_member(m, i))
        .collect::<Result<Vec<_>, _>>()?;

    let team_name = team_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    Ok((team_name, members))
}

/// Trims and canonicalises a member, rejecting unusable fields.
pub fn normalize_member(member: Member, index: usize) -> Result<Member, RegistrationError> {
    let full_name = member.full_name.split_whitespace().join(" ");
    let label = if full_name.is_empty() {
        format!("member {}", index + 1)
    } else {
        full_name.clone()
    };
    let invalid = |field| RegistrationError::InvalidField {
        member: label.clone(),
        field,
    };

    if full_name.is_empty() {
        return Err(invalid("full name"));
    }

    let branch = member.branch.trim().to_ascii_uppercase();
    let roll_no = validate_roll_no(&member.roll_no, Some(&branch)).map_err(|source| {
        RegistrationError::InvalidRollNo {
            member: label.clone(),
            source,
        }
    })?;

    let section = member.section.trim().to_ascii_uppercase();
    if section.is_empty()
        || section.len() > 3
        || !section.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(invalid("section"));
    }

    let email = member.email.trim().to_ascii_lowercase();
    if email.parse::<Address>().is_err() {
        return Err(invalid("email"));
    }

    let phone = normalize_phone(&member.phone).ok_or_else(|| invalid("phone number"))?;

    Ok(Member {
        full_name,
        roll_no: roll_no.into_string(),
        branch,
        section,
        email,
        phone,
    })
}

/// Canonical phone form: Indian numbers become their ten subscriber digits,
/// whether written with `+91`, `91` or a trunk `0`. Other numbers need a
/// leading `+` and keep it.
fn normalize_phone(phone: &str) -> Option<String> {
    let phone = phone.trim();
    let (plus, rest) = match phone.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, phone),
    };
    if !rest.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-') {
        return None;
    }
    let digits: String = rest.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        10 if !plus => Some(digits),
        12 if digits.starts_with("91") => Some(digits[2..].to_string()),
        11 if !plus && digits.starts_with('0') => Some(digits[1..].to_string()),
        11..=13 if plus => Some(format!("+{digits}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(now: DateTime<Utc>) -> Event {
        Event {
            id: 1,
            title: "Code Sprint".to_string(),
            description: String::new(),
            venue: None,
            image_url: None,
            date: now + Duration::days(10),
            deadline: Some(now + Duration::days(5)),
            max_registrations: 0,
            current_registrations: 0,
            is_team_event: false,
            min_team_size: 1,
            max_team_size: 1,
            registration_open: true,
            members_only: false,
            visible: true,
            created_at: now,
        }
    }

    fn member(name: &str, roll_no: &str) -> Member {
        Member {
            full_name: name.to_string(),
            roll_no: roll_no.to_string(),
            branch: "cse".to_string(),
            section: "a".to_string(),
            email: format!("{}@College.edu", name.to_lowercase()),
            phone: "98765 43210".to_string(),
        }
    }

    #[test]
    fn preconditions_report_in_order() {
        let now = Utc::now();
        let mut e = event(now);
        e.registration_open = false;
        e.deadline = Some(now - Duration::days(1));
        assert!(matches!(check_open(&e, now), Err(RegistrationError::Closed)));

        e.registration_open = true;
        assert!(matches!(check_open(&e, now), Err(RegistrationError::DeadlinePassed)));

        e.deadline = None;
        e.date = now - Duration::hours(1);
        assert!(matches!(check_open(&e, now), Err(RegistrationError::EventEnded)));

        e.date = now + Duration::days(1);
        e.max_registrations = 2;
        e.current_registrations = 2;
        assert!(matches!(check_open(&e, now), Err(RegistrationError::CapacityReached)));

        e.max_registrations = 0;
        assert!(check_open(&e, now).is_ok());
    }

    #[test]
    fn deadline_is_inclusive() {
        let now = Utc::now();
        let mut e = event(now);
        e.deadline = Some(now);
        assert!(check_open(&e, now).is_ok());
    }

    #[test]
    fn individual_event_takes_exactly_one_member() {
        let e = event(Utc::now());
        let (team, members) = assemble(
            &e,
            RegistrationForm {
                team_name: Some("ignored".to_string()),
                members: vec![member("Asha", "24891a0501")],
            },
        )
        .unwrap();
        assert_eq!(team, None);
        assert_eq!(members[0].roll_no, "24891A0501");
        assert_eq!(members[0].email, "asha@college.edu");
        assert_eq!(members[0].phone, "9876543210");
        assert_eq!(members[0].section, "A");

        let err = assemble(&e, RegistrationForm::default()).unwrap_err();
        assert!(matches!(err, RegistrationError::MissingMember));
    }

    #[test]
    fn team_size_boundaries() {
        let mut e = event(Utc::now());
        e.is_team_event = true;
        e.min_team_size = 3;
        e.max_team_size = 4;

        let short = RegistrationForm {
            team_name: Some(" Byte Me ".to_string()),
            members: vec![member("Asha", "24891A0501"), member("Bala", "24891A0502")],
        };
        assert!(matches!(
            assemble(&e, short.clone()),
            Err(RegistrationError::TeamSizeInvalid { min: 3, max: 4, actual: 2 })
        ));

        let mut exact = short;
        exact.members.push(member("Chitra", "24891A0503"));
        let (team, members) = assemble(&e, exact).unwrap();
        assert_eq!(team.as_deref(), Some("Byte Me"));
        assert_eq!(members.len(), 3);
    }

    #[test]
    fn duplicate_roll_numbers_in_team_are_rejected() {
        let mut e = event(Utc::now());
        e.is_team_event = true;
        e.min_team_size = 2;
        e.max_team_size = 3;

        let form = RegistrationForm {
            team_name: None,
            members: vec![member("Asha", "24891A0501"), member("Bala", "24891a0501 ")],
        };
        assert!(matches!(
            assemble(&e, form),
            Err(RegistrationError::DuplicateInTeam(roll)) if roll == "24891A0501"
        ));
    }

    #[test]
    fn member_fields_are_checked() {
        let mut bad_branch = member("Asha", "24891A0593");
        bad_branch.branch = "ECE".to_string();
        let err = normalize_member(bad_branch, 0).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidRollNo { .. }));
        assert!(err.to_string().contains("does not match branch ECE"));

        let mut bad_email = member("Asha", "24891A0593");
        bad_email.email = "not-an-email".to_string();
        assert!(matches!(
            normalize_member(bad_email, 0),
            Err(RegistrationError::InvalidField { field: "email", .. })
        ));

        let mut bad_phone = member("Asha", "24891A0593");
        bad_phone.phone = "12345".to_string();
        assert!(matches!(
            normalize_member(bad_phone, 0),
            Err(RegistrationError::InvalidField { field: "phone number", .. })
        ));

        let unnamed = member("   ", "24891A0593");
        assert!(matches!(
            normalize_member(unnamed, 1),
            Err(RegistrationError::InvalidField { member, field: "full name" }) if member == "member 2"
        ));
    }

    #[test]
    fn indian_phone_numbers_share_one_form() {
        for written in ["9876543210", "+91 98765-43210", "919876543210", "098765 43210"] {
            assert_eq!(normalize_phone(written).as_deref(), Some("9876543210"), "{written}");
        }
        assert_eq!(normalize_phone("+44 7700 900123").as_deref(), Some("+447700900123"));
        assert_eq!(normalize_phone("98765abc10"), None);
        assert_eq!(normalize_phone("12345678901"), None);
        assert_eq!(normalize_phone("+9876543210"), None);
    }
}
