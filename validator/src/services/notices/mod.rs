//! Notice and invitation texts.
//!
//! Templates are plain text (HTML is allowed, the directory delivers notices as
//! `text/html`) with `{{username}}` and `{{challenge}}` placeholders. Unknown
//! placeholders render as an empty string.

use crate::config::{ChallengeConfig, NoticeConfig};
use crate::services::directory::Notice;
use regex::Regex;
use std::collections::HashMap;

const ALREADY_GRANTED: &str = "You have already joined the data access team. To download \
    the data, please go to the 'Files' tab of the challenge website.";

const PENDING_INVITE: &str = "An invitation to join the data access team has already been \
    sent. Please check your inbox or spam folder for an email from the directory.";

const MISSING_REGISTRATION: &str = "You must first register and agree to the Terms & \
    Conditions of the latest challenge:<br/><br/>> {{challenge}}<br/><br/>If you are still \
    interested in gaining access to the data, please register for the challenge listed above, \
    then re-submit the form.";

const INVITATION: &str = "Thank you for your interest in the {{challenge}} data! After \
    clicking 'Join', you can start downloading data from the 'Files' tab of the challenge \
    website.";

/// Why a submitter gets a notice instead of an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    AlreadyGranted,
    PendingInvite,
    MissingRegistration,
}

impl NoticeKind {
    pub fn title(self) -> &'static str {
        match self {
            NoticeKind::AlreadyGranted => "Access already granted",
            NoticeKind::PendingInvite => "Pending invite",
            NoticeKind::MissingRegistration => "Missing registration",
        }
    }
}

pub struct NoticeTemplates {
    placeholder: Regex,
    subject_prefix: String,
    signature: String,
    challenge: String,
    already_granted: String,
    pending_invite: String,
    missing_registration: String,
    invitation: String,
}

impl NoticeTemplates {
    pub fn new(notices: &NoticeConfig, challenge: &ChallengeConfig) -> Result<Self, regex::Error> {
        let pick = |custom: &Option<String>, default: &str| {
            custom.clone().unwrap_or_else(|| default.to_string())
        };
        Ok(Self {
            placeholder: Regex::new(r"\{\{\s*([A-Za-z_]+)\s*\}\}")?,
            subject_prefix: notices.subject_prefix.clone(),
            signature: notices.signature.clone(),
            challenge: challenge.display_name().to_string(),
            already_granted: pick(&notices.already_granted, ALREADY_GRANTED),
            pending_invite: pick(&notices.pending_invite, PENDING_INVITE),
            missing_registration: pick(&notices.missing_registration, MISSING_REGISTRATION),
            invitation: pick(&notices.invitation, INVITATION),
        })
    }

    fn render(&self, template: &str, username: &str) -> String {
        let mut values = HashMap::new();
        values.insert("username", username);
        values.insert("challenge", self.challenge.as_str());

        self.placeholder
            .replace_all(template, |caps: &regex::Captures| {
                values.get(&caps[1]).copied().unwrap_or_default().to_string()
            })
            .into_owned()
    }

    pub fn notice(&self, kind: NoticeKind, username: &str) -> Notice {
        let template = match kind {
            NoticeKind::AlreadyGranted => &self.already_granted,
            NoticeKind::PendingInvite => &self.pending_invite,
            NoticeKind::MissingRegistration => &self.missing_registration,
        };
        let body = format!(
            "Dear {},<br/><br/>{}<br/><br/>Sincerely,<br/>{}",
            username,
            self.render(template, username),
            self.signature
        );
        Notice {
            subject: format!("{} - {}", self.subject_prefix, kind.title()),
            body,
        }
    }

    pub fn invitation(&self, username: &str) -> String {
        self.render(&self.invitation, username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge() -> ChallengeConfig {
        ChallengeConfig {
            code: "3523569".to_string(),
            name: "Lighthouse 2025".to_string(),
            access_team: Some("3523636".to_string()),
        }
    }

    #[test]
    fn missing_registration_names_the_challenge() {
        let templates = NoticeTemplates::new(&NoticeConfig::default(), &challenge()).unwrap();
        let notice = templates.notice(NoticeKind::MissingRegistration, "alice");

        assert_eq!(notice.subject, "Data Access Form - Missing registration");
        assert!(notice.body.starts_with("Dear alice,<br/><br/>"));
        assert!(notice.body.contains("> Lighthouse 2025<br/>"));
        assert!(notice.body.ends_with("Sincerely,<br/>Data Access Bot"));
    }

    #[test]
    fn custom_template_overrides_default() {
        let config = NoticeConfig {
            pending_invite: Some("Hi {{ username }}, see {{challenge}}. {{unknown}}!".to_string()),
            ..NoticeConfig::default()
        };
        let templates = NoticeTemplates::new(&config, &challenge()).unwrap();
        let notice = templates.notice(NoticeKind::PendingInvite, "bob");
        assert!(notice.body.contains("Hi bob, see Lighthouse 2025. !"));
    }

    #[test]
    fn invitation_uses_code_when_name_is_blank() {
        let mut challenge = challenge();
        challenge.name = String::new();
        let templates = NoticeTemplates::new(&NoticeConfig::default(), &challenge).unwrap();
        assert!(templates.invitation("carol").contains("the 3523569 data"));
    }
}
