//! Validation for roster, popup and gallery content.

use crate::{
    error::{Classify, ErrorKind},
    models::{GalleryInput, PopupInput, RosterInput},
};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{0} must be an absolute http(s) URL")]
    InvalidUrl(&'static str),
}

impl Classify for ContentError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

pub fn url(field: &'static str, value: &str) -> Result<String, ContentError> {
    let parsed = Url::parse(value.trim()).map_err(|_| ContentError::InvalidUrl(field))?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(parsed.into()),
        _ => Err(ContentError::InvalidUrl(field)),
    }
}

/// Blank values clear the field.
pub fn optional_url(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, ContentError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => url(field, value).map(Some),
    }
}

fn required(field: &'static str, value: String) -> Result<String, ContentError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(ContentError::Missing(field));
    }
    Ok(value)
}

pub fn roster(input: RosterInput) -> Result<RosterInput, ContentError> {
    Ok(RosterInput {
        name: required("name", input.name)?,
        role: required("role", input.role)?,
        image_url: optional_url("imageUrl", input.image_url)?,
        linkedin: optional_url("linkedin", input.linkedin)?,
        github: optional_url("github", input.github)?,
        display_order: input.display_order,
    })
}

pub fn popup(input: PopupInput) -> Result<PopupInput, ContentError> {
    Ok(PopupInput {
        title: required("title", input.title)?,
        message: input.message.trim().to_string(),
        image_url: optional_url("imageUrl", input.image_url)?,
        link: optional_url("link", input.link)?,
        active: input.active,
    })
}

pub fn gallery(input: GalleryInput) -> Result<GalleryInput, ContentError> {
    Ok(GalleryInput {
        title: required("title", input.title)?,
        image_url: url("imageUrl", &input.image_url)?,
        event_id: input.event_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_absolute_web_urls_pass() {
        assert!(url("link", "https://cdn.example.com/a.png").is_ok());
        assert!(url("link", " http://example.com ").is_ok());
        assert!(matches!(url("link", "/uploads/a.png"), Err(ContentError::InvalidUrl("link"))));
        assert!(url("link", "javascript:alert(1)").is_err());
        assert!(url("link", "mailto:club@college.edu").is_err());
    }

    #[test]
    fn blank_optional_urls_are_cleared() {
        assert_eq!(optional_url("github", Some("  ".to_string())).unwrap(), None);
        assert_eq!(optional_url("github", None).unwrap(), None);
    }

    #[test]
    fn roster_entries_need_name_and_role() {
        let input = RosterInput {
            name: " Asha ".to_string(),
            role: String::new(),
            image_url: None,
            linkedin: None,
            github: Some("https://github.com/asha".to_string()),
            display_order: 1,
        };
        assert!(matches!(roster(input.clone()), Err(ContentError::Missing("role"))));

        let entry = roster(RosterInput {
            role: "Lead".to_string(),
            ..input
        })
        .unwrap();
        assert_eq!(entry.name, "Asha");
        assert_eq!(entry.github.as_deref(), Some("https://github.com/asha"));
    }
}
