//! Roster checks for members-only events.

use super::RegistrationError;
use crate::{
    models::{Member, RegistrationStatus},
    roll_no::RollNumber,
    store::Store,
};

fn code_of(member: &Member) -> Result<String, RegistrationError> {
    let roll: RollNumber = member
        .roll_no
        .parse()
        .map_err(|source| RegistrationError::InvalidRollNo {
            member: member.full_name.clone(),
            source,
        })?;
    Ok(roll.branch_code().to_string())
}

/// Every member must share the leader's branch code, hold an approved club
/// membership and sit in the leader's section. The branch check stops at the
/// first offender; the other two report every offending member at once.
pub async fn check_roster(store: &dyn Store, members: &[Member]) -> Result<(), RegistrationError> {
    let Some(leader) = members.first() else {
        return Ok(());
    };

    let leader_code = code_of(leader)?;
    for member in &members[1..] {
        let code = code_of(member)?;
        if code != leader_code {
            return Err(RegistrationError::BranchMismatchInTeam {
                member: member.full_name.clone(),
                code,
                leader_code,
            });
        }
    }

    let mut sections = Vec::with_capacity(members.len());
    let mut outsiders = Vec::new();
    for member in members {
        let approved = store
            .find_membership(&member.roll_no)
            .await?
            .filter(|r| r.status == RegistrationStatus::Approved);
        match approved.as_ref().and_then(|r| r.leader()) {
            Some(record) => sections.push((member, record.section.clone())),
            None => outsiders.push(member.full_name.clone()),
        }
    }
    if !outsiders.is_empty() {
        return Err(RegistrationError::AccessDenied { members: outsiders });
    }

    let leader_section = sections[0].1.clone();
    let mismatched: Vec<_> = sections[1..]
        .iter()
        .filter(|(_, section)| *section != leader_section)
        .map(|(member, _)| member.full_name.clone())
        .collect();
    if !mismatched.is_empty() {
        return Err(RegistrationError::SectionMismatch {
            section: leader_section,
            members: mismatched,
        });
    }

    Ok(())
}
