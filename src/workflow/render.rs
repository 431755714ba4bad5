use crate::backend::models::Service;
use crate::backend::BackendError;
use crate::chat::{ActionButton, Attachment, ChatMessage};

use super::draft::{IncidentDraft, UpdateDraft};
use super::key::{DraftKey, DraftKind};
use super::vocabulary::StatusVocabulary;

const SERVICES_COLOR: &str = "#fe117a";
const STATUS_COLOR: &str = "#00aaff";
const NEXT_STEP_COLOR: &str = "#551a8b";
const REVIEW_COLOR: &str = "#00d800";

/// Builds callback URLs the action buttons point at. The query string
/// carries the event name and payload plus the draft key tags.
#[derive(Debug, Clone)]
pub struct CallbackLinks {
    site_url: String,
}

impl CallbackLinks {
    pub fn new(site_url: &str) -> Self {
        let mut site_url = site_url.trim_end_matches('/').to_string();
        if !site_url.starts_with("http://") && !site_url.starts_with("https://") {
            site_url = format!("https://{site_url}");
        }
        Self { site_url }
    }

    pub fn incident_status(&self, key: &DraftKey, status: &str) -> String {
        format!(
            "{}/incident?userId={}&roomId={}&status={}",
            self.site_url,
            key.user_id,
            key.room_id,
            encode(status)
        )
    }

    pub fn service(&self, key: &DraftKey, name: &str) -> String {
        format!(
            "{}/service?userId={}&roomId={}&service={}",
            self.site_url,
            key.user_id,
            key.room_id,
            encode(name)
        )
    }

    pub fn service_status(&self, key: &DraftKey, name: &str, status: &str) -> String {
        format!(
            "{}/status?userId={}&roomId={}&service={}&status={}",
            self.site_url,
            key.user_id,
            key.room_id,
            encode(name),
            encode(status)
        )
    }

    pub fn update_status(&self, key: &DraftKey, status: &str) -> String {
        format!(
            "{}/update?userId={}&roomId={}&status={}",
            self.site_url,
            key.user_id,
            key.room_id,
            encode(status)
        )
    }

    pub fn process(&self, key: &DraftKey, step: &str) -> String {
        let mut url = format!(
            "{}/process?userId={}&roomId={}&step={}",
            self.site_url, key.user_id, key.room_id, step
        );
        if key.kind == DraftKind::Update {
            url.push_str("&which=update");
        }
        url
    }
}

/// Minimal query-value encoding; the payload values are status names and
/// service names, which only ever need spaces handled.
fn encode(value: &str) -> String {
    value.replace(' ', "%20")
}

/// Turns workflow situations into chat messages. Pure string building;
/// nothing here talks to the network.
#[derive(Debug, Clone)]
pub struct MessageRenderer {
    alias: String,
    links: CallbackLinks,
    status_page_url: String,
}

impl MessageRenderer {
    pub fn new(alias: &str, links: CallbackLinks, status_page_url: &str) -> Self {
        Self {
            alias: alias.to_string(),
            links,
            status_page_url: status_page_url.to_string(),
        }
    }

    pub fn notice(&self, room_id: &str, text: impl Into<String>) -> ChatMessage {
        ChatMessage::new(room_id, &self.alias, text)
    }

    pub fn conflict_notice(&self, key: &DraftKey) -> ChatMessage {
        let text = match key.kind {
            DraftKind::Incident => {
                "You are already creating an incident. Please abort if you wish to start over."
            }
            DraftKind::Update => {
                "You are already updating an incident. Please abort if you wish to start over."
            }
        };
        self.notice(&key.room_id, text)
    }

    pub fn backend_down_notice(&self, room_id: &str, error: &BackendError) -> ChatMessage {
        self.notice(
            room_id,
            format!("The status backend could not be reached: `{error}`. Maybe try again?"),
        )
    }

    pub fn not_found_notice(&self, room_id: &str, incident_id: u64) -> ChatMessage {
        self.notice(
            room_id,
            format!(
                "Failed to retrieve the incident by the id of `{incident_id}`. You sure it exists?"
            ),
        )
    }

    /// Opening prompt for a creation draft: status buttons, the service
    /// catalog and the pointer to the describe command
    pub fn begin_prompt(
        &self,
        key: &DraftKey,
        catalog: &[Service],
        vocabulary: &StatusVocabulary,
    ) -> ChatMessage {
        let mut message = ChatMessage::new(
            &key.room_id,
            &self.alias,
            "Please set the incident status, select the services which are affected, \
             then describe it with `/incident describe <brief description of the incident>`.",
        );

        message = message.with_attachment(Attachment {
            color: Some(STATUS_COLOR.to_string()),
            title: Some("Incident Status".to_string()),
            actions: vocabulary
                .incident_statuses()
                .iter()
                .map(|status| ActionButton {
                    text: status.clone(),
                    url: self.links.incident_status(key, status),
                })
                .collect(),
            ..Attachment::default()
        });

        message.with_attachment(self.service_buttons(key, catalog))
    }

    /// Service picker with the next-step button, also used to re-render
    /// the selection from a process link
    pub fn service_selection_prompt(&self, key: &DraftKey, catalog: &[Service]) -> ChatMessage {
        let message = ChatMessage::new(
            &key.room_id,
            &self.alias,
            "Please select the services which are affected.",
        )
        .with_attachment(self.service_buttons(key, catalog));

        message.with_attachment(self.next_step(key, "status"))
    }

    /// Per-service status buttons plus the move to review
    pub fn status_selection_prompt(
        &self,
        key: &DraftKey,
        draft: &IncidentDraft,
        vocabulary: &StatusVocabulary,
    ) -> ChatMessage {
        let mut message = ChatMessage::new(
            &key.room_id,
            &self.alias,
            "Please set the status of each affected service.",
        );

        for service in draft.services() {
            message = message.with_attachment(Attachment {
                color: Some(STATUS_COLOR.to_string()),
                title: Some(service.name.clone()),
                actions: vocabulary
                    .service_statuses()
                    .iter()
                    .map(|status| ActionButton {
                        text: status.clone(),
                        url: self.links.service_status(key, &service.name, status),
                    })
                    .collect(),
                ..Attachment::default()
            });
        }

        message.with_attachment(self.next_step(key, "review"))
    }

    /// Full draft rendered for a last look before the terminal commit
    pub fn review_prompt(&self, key: &DraftKey, draft: &IncidentDraft) -> ChatMessage {
        let rendered = draft
            .publish_payload()
            .map(|payload| serde_json::to_string_pretty(&payload).unwrap_or_default())
            .unwrap_or_default();

        ChatMessage::new(
            &key.room_id,
            &self.alias,
            "Please review the incident. Once you have reviewed, hit the publish button to make it live. :smile:",
        )
        .with_attachment(Attachment {
            color: Some(REVIEW_COLOR.to_string()),
            title: Some("Incident Data".to_string()),
            text: Some(format!("```\n{rendered}\n```")),
            ..Attachment::default()
        })
        .with_attachment(self.publish_button(key))
    }

    pub fn published_message(&self, room_id: &str, incident_id: u64) -> ChatMessage {
        self.notice(
            room_id,
            format!(
                "Incident created (id `{incident_id}`)! {}/",
                self.status_page_url
            ),
        )
    }

    pub fn publish_failed_notice(&self, room_id: &str, error: &BackendError) -> ChatMessage {
        self.notice(
            room_id,
            format!(
                "Sadly, an error occured with the request to create the incident:\n\n`{error}`\n\nMaybe try again?"
            ),
        )
    }

    /// Opening prompt for an update draft
    pub fn update_begin_prompt(
        &self,
        key: &DraftKey,
        actor_name: Option<&str>,
        vocabulary: &StatusVocabulary,
    ) -> ChatMessage {
        let intro = match actor_name {
            Some(name) => format!(
                "@{name} has started an update for an incident.\n\nPlease select the status of the update:"
            ),
            None => "An update for an incident has been started.\n\nPlease select the status of the update:".to_string(),
        };

        ChatMessage::new(&key.room_id, &self.alias, intro)
            .with_attachment(Attachment {
                color: Some(STATUS_COLOR.to_string()),
                title: Some("Incident Update Status".to_string()),
                collapsed: true,
                actions: vocabulary
                    .incident_statuses()
                    .iter()
                    .map(|status| ActionButton {
                        text: status.clone(),
                        url: self.links.update_status(key, status),
                    })
                    .collect(),
                ..Attachment::default()
            })
            .with_attachment(self.next_step(key, "describe"))
    }

    pub fn explain_prompt(&self, room_id: &str) -> ChatMessage {
        self.notice(
            room_id,
            "Now, please provide a message for the update with the command \
             `/incident explain <brief explanation of the update>`",
        )
    }

    pub fn update_review_prompt(&self, key: &DraftKey, draft: &UpdateDraft) -> ChatMessage {
        let rendered = draft
            .publish_payload()
            .map(|(_, payload)| serde_json::to_string_pretty(&payload).unwrap_or_default())
            .unwrap_or_default();

        ChatMessage::new(
            &key.room_id,
            &self.alias,
            "Please review the incident update. Once you have reviewed, hit the publish button to make it live. :smile:",
        )
        .with_attachment(Attachment {
            color: Some(REVIEW_COLOR.to_string()),
            title: Some("Update Data".to_string()),
            text: Some(format!("```\n{rendered}\n```")),
            ..Attachment::default()
        })
        .with_attachment(self.publish_button(key))
    }

    pub fn update_published_message(&self, room_id: &str, incident_id: u64) -> ChatMessage {
        self.notice(
            room_id,
            format!(
                "Incident update created (id `{incident_id}`)! {}/",
                self.status_page_url
            ),
        )
    }

    pub fn abort_confirmation(&self, key: &DraftKey, actor_name: Option<&str>) -> ChatMessage {
        let what = match key.kind {
            DraftKind::Incident => "creating the incident",
            DraftKind::Update => "updating the incident",
        };
        let text = match actor_name {
            Some(name) => format!("@{name} has stopped {what}."),
            None => format!("Stopped {what}."),
        };
        self.notice(&key.room_id, text)
    }

    pub fn nothing_to_abort_notice(&self, room_id: &str) -> ChatMessage {
        self.notice(room_id, "You were not creating an incident to abort.")
    }

    fn service_buttons(&self, key: &DraftKey, catalog: &[Service]) -> Attachment {
        Attachment {
            color: Some(SERVICES_COLOR.to_string()),
            title: Some("Affected Services".to_string()),
            actions: catalog
                .iter()
                .map(|service| ActionButton {
                    text: service.name.clone(),
                    url: self.links.service(key, &service.name),
                })
                .collect(),
            ..Attachment::default()
        }
    }

    fn next_step(&self, key: &DraftKey, step: &str) -> Attachment {
        Attachment {
            color: Some(NEXT_STEP_COLOR.to_string()),
            actions: vec![ActionButton {
                text: "Next Step".to_string(),
                url: self.links.process(key, step),
            }],
            ..Attachment::default()
        }
    }

    fn publish_button(&self, key: &DraftKey) -> Attachment {
        Attachment {
            color: Some(NEXT_STEP_COLOR.to_string()),
            actions: vec![ActionButton {
                text: "Publish! 🚀".to_string(),
                url: self.links.process(key, "publish"),
            }],
            ..Attachment::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_normalize_the_site_url() {
        let links = CallbackLinks::new("chat.example.com/");
        let key = DraftKey::incident("u1", "r1");
        assert_eq!(
            links.service(&key, "checkout"),
            "https://chat.example.com/service?userId=u1&roomId=r1&service=checkout"
        );
    }

    #[test]
    fn process_links_carry_the_update_discriminator() {
        let links = CallbackLinks::new("http://localhost:3000");
        let key = DraftKey::update("u1", "r1");
        assert_eq!(
            links.process(&key, "publish"),
            "http://localhost:3000/process?userId=u1&roomId=r1&step=publish&which=update"
        );
    }

    #[test]
    fn status_values_with_spaces_survive_the_query_string() {
        let links = CallbackLinks::new("http://localhost:3000");
        let key = DraftKey::incident("u1", "r1");
        let url = links.incident_status(&key, "Scheduled Maintenance");
        assert!(url.ends_with("status=Scheduled%20Maintenance"));
    }
}
