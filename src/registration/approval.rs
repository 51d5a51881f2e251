//! Admin decisions on pending registrations.

use super::Registrar;
use crate::{
    email::{self, templates, Dispatch},
    error::{Classify, ErrorKind},
    models::{Registration, RegistrationKind, RegistrationStatus},
    store::{StoreError, Transition},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("registration {0} not found")]
    NotFound(i32),
    #[error("a registration can only be approved or rejected")]
    InvalidTarget,
    #[error("registration was already {0}")]
    AlreadyDecided(RegistrationStatus),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for ApprovalError {
    fn kind(&self) -> ErrorKind {
        match self {
            ApprovalError::NotFound(_) => ErrorKind::NotFound,
            ApprovalError::InvalidTarget => ErrorKind::Validation,
            ApprovalError::AlreadyDecided(_) => ErrorKind::Conflict,
            ApprovalError::Store(_) => ErrorKind::Downstream,
        }
    }
}

#[derive(Debug)]
pub struct Decision {
    pub registration: Registration,
    /// False when the registration already had the requested status.
    pub changed: bool,
    pub email: Dispatch,
}

impl Registrar {
    /// Moves a pending registration to `approved` or `rejected`.
    ///
    /// Repeating a decision is a no-op and sends nothing. Membership
    /// applications notify the applicant once, on the actual transition.
    pub async fn decide(
        &self,
        id: i32,
        to: RegistrationStatus,
    ) -> Result<Decision, ApprovalError> {
        if to == RegistrationStatus::Pending {
            return Err(ApprovalError::InvalidTarget);
        }

        let registration = match self.store.transition_status(id, to).await? {
            Transition::Missing => return Err(ApprovalError::NotFound(id)),
            Transition::Unchanged(registration) if registration.status == to => {
                return Ok(Decision {
                    registration,
                    changed: false,
                    email: Dispatch::none(),
                })
            }
            Transition::Unchanged(registration) => {
                return Err(ApprovalError::AlreadyDecided(registration.status))
            }
            Transition::Applied(registration) => registration,
        };

        tracing::info!(registration_id = id, status = %to, "registration status changed");

        let email = match registration.kind {
            RegistrationKind::GeneralMembership => registration
                .leader()
                .filter(|m| !m.email.trim().is_empty())
                .and_then(|m| templates::membership_decision(&self.club_name, to, m)),
            RegistrationKind::Event => None,
        };
        let email = email::dispatch(self.mailer.clone(), email.into_iter().collect());

        Ok(Decision {
            registration,
            changed: true,
            email,
        })
    }
}
