//! Admin-side event validation.

use crate::{
    content::{self, ContentError},
    error::{Classify, ErrorKind},
    models::EventInput,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event title is required")]
    EmptyTitle,
    #[error("maximum registrations cannot be negative")]
    NegativeCapacity,
    #[error("team events need 2 <= minimum ({min}) <= maximum ({max}) team size")]
    TeamBounds { min: i32, max: i32 },
    #[error("registration deadline must not be after the event date")]
    DeadlineAfterEvent,
    #[error(transparent)]
    Content(#[from] ContentError),
}

impl Classify for EventError {
    fn kind(&self) -> ErrorKind {
        match self {
            EventError::Content(e) => e.kind(),
            _ => ErrorKind::Validation,
        }
    }
}

/// Trims and checks an event before it is stored. Individual events always
/// carry a team size of one.
pub fn validate(mut input: EventInput) -> Result<EventInput, EventError> {
    input.title = input.title.trim().to_string();
    if input.title.is_empty() {
        return Err(EventError::EmptyTitle);
    }
    input.description = input.description.trim().to_string();
    input.venue = input
        .venue
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    input.image_url = content::optional_url("imageUrl", input.image_url)?;

    if input.max_registrations < 0 {
        return Err(EventError::NegativeCapacity);
    }

    if input.is_team_event {
        if input.min_team_size < 2 || input.min_team_size > input.max_team_size {
            return Err(EventError::TeamBounds {
                min: input.min_team_size,
                max: input.max_team_size,
            });
        }
    } else {
        input.min_team_size = 1;
        input.max_team_size = 1;
    }

    if input.deadline.map_or(false, |deadline| deadline > input.date) {
        return Err(EventError::DeadlineAfterEvent);
    }

    Ok(input)
}
