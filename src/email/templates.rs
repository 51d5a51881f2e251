use super::{escape_html, Email};
use crate::models::{Event, Member, Registration, RegistrationStatus};

fn layout(club: &str, heading: &str, body: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #1f2937;">{heading}</h2>
  {body}
  <p style="color: #6b7280; font-size: 12px;">This is an automated message from {club}.</p>
</div>"#,
        heading = escape_html(heading),
        club = escape_html(club),
    )
}

fn to(member: &Member, subject: String, html: String) -> Email {
    Email {
        to: member.email.clone(),
        to_name: Some(member.full_name.clone()),
        subject,
        html,
    }
}

pub fn event_confirmation(
    club: &str,
    event: &Event,
    registration: &Registration,
    member: &Member,
) -> Email {
    let team = registration
        .team_name
        .as_deref()
        .map(|name| format!("<p>Team: <strong>{}</strong></p>", escape_html(name)))
        .unwrap_or_default();
    let venue = event
        .venue
        .as_deref()
        .map(|venue| format!("<p>Venue: {}</p>", escape_html(venue)))
        .unwrap_or_default();

    let body = format!(
        r#"<p>Hi {name},</p>
  <p>You are registered for <strong>{title}</strong>.</p>
  <p>Date: {date}</p>
  {venue}
  {team}
  <p>Roll number: {roll_no}<br/>Registration ID: {id}</p>"#,
        name = escape_html(&member.full_name),
        title = escape_html(&event.title),
        date = event.date.format("%d %b %Y, %H:%M UTC"),
        roll_no = escape_html(&member.roll_no),
        id = registration.id,
    );

    to(
        member,
        format!("Registration confirmed: {}", event.title),
        layout(club, "Registration confirmed", &body),
    )
}

pub fn membership_received(club: &str, member: &Member) -> Email {
    let body = format!(
        r#"<p>Hi {name},</p>
  <p>We have received your application to join {club}. Our team will review it and you will hear from us once a decision is made.</p>"#,
        name = escape_html(&member.full_name),
        club = escape_html(club),
    );

    to(
        member,
        format!("Application received - {club}"),
        layout(club, "Application received", &body),
    )
}

/// Email announcing the outcome of a membership application, if the status
/// is a decision.
pub fn membership_decision(
    club: &str,
    status: RegistrationStatus,
    member: &Member,
) -> Option<Email> {
    let name = escape_html(&member.full_name);
    let (subject, heading, body) = match status {
        RegistrationStatus::Approved => (
            format!("Welcome to {club}!"),
            "Membership approved",
            format!(
                "<p>Hi {name},</p>\n  <p>Your membership application has been approved. Welcome aboard! You can now register for members-only events.</p>"
            ),
        ),
        RegistrationStatus::Rejected => (
            format!("Your application to {club}"),
            "Membership update",
            format!(
                "<p>Hi {name},</p>\n  <p>Thank you for your interest. Unfortunately we are unable to accept your membership application at this time.</p>"
            ),
        ),
        RegistrationStatus::Pending => return None,
    };

    Some(to(member, subject, layout(club, heading, &body)))
}

pub fn announcement(club: &str, event: &Event, member: &Member, subject: &str, message: &str) -> Email {
    let paragraphs: String = message
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p.trim()).replace('\n', "<br/>")))
        .collect();
    let body = format!(
        "<p>Hi {name},</p>\n  {paragraphs}",
        name = escape_html(&member.full_name),
    );

    to(
        member,
        subject.to_string(),
        layout(club, &event.title, &body),
    )
}
