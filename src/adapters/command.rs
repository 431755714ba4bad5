use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::chat::{ChatMessage, Notifier, NotifyError};
use crate::workflow::{
    effects, DraftKey, WorkflowEngine, WorkflowError, WorkflowEvent,
};

use super::modal::{ModalError, ModalSessions};

const USAGE: &str =
    "Invalid syntax. Use: `/incident <create|describe|explain|update|close|abort>`";

/// Incoming slash command, as the chat platform's command webhook posts it
#[derive(Debug, Clone, Deserialize)]
pub struct CommandContext {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(rename = "roomId")]
    pub room_id: String,
    #[serde(rename = "roomMembers", default)]
    pub room_members: Vec<String>,
    #[serde(rename = "triggerId", default)]
    pub trigger_id: Option<String>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Slash command front end. Picks the operation by argument count and
/// keyword, after the room and system-participant checks that are
/// independent of any draft state.
pub struct CommandAdapter {
    engine: Arc<WorkflowEngine>,
    modals: Arc<ModalSessions>,
    notifier: Arc<dyn Notifier>,
    expected_room_id: String,
    system_user: String,
    alias: String,
}

impl CommandAdapter {
    pub fn new(
        engine: Arc<WorkflowEngine>,
        modals: Arc<ModalSessions>,
        notifier: Arc<dyn Notifier>,
        expected_room_id: &str,
        system_user: &str,
        alias: &str,
    ) -> Self {
        Self {
            engine,
            modals,
            notifier,
            expected_room_id: expected_room_id.to_string(),
            system_user: system_user.to_string(),
            alias: alias.to_string(),
        }
    }

    pub async fn dispatch(&self, context: CommandContext) -> Result<(), CommandError> {
        if context.room_id != self.expected_room_id {
            info!(room_id = %context.room_id, "Command from an unexpected room");
            return self
                .notice(
                    &context,
                    format!(
                        "Unexpected room. The room you're in (`{}`) is not the expected room.",
                        context.room_id
                    ),
                )
                .await;
        }

        if !context
            .room_members
            .iter()
            .any(|member| member.eq_ignore_ascii_case(&self.system_user))
        {
            warn!(system_user = %self.system_user, "The system participant is not in the room");
            return self
                .notice(
                    &context,
                    format!(
                        "Please invite the @{} user. (`/invite @{}`)",
                        self.system_user, self.system_user
                    ),
                )
                .await;
        }

        let args: Vec<String> = context
            .text
            .split_whitespace()
            .map(str::to_string)
            .collect();

        match args.len() {
            0 => self.notice(&context, USAGE).await,
            1 => self.handle_one_argument(&context, &args[0]).await,
            2 => self.handle_two_arguments(&context, &args).await,
            _ => self.handle_many_arguments(&context, &args).await,
        }
    }

    async fn handle_one_argument(
        &self,
        context: &CommandContext,
        keyword: &str,
    ) -> Result<(), CommandError> {
        match keyword.to_lowercase().as_str() {
            "abort" => {
                let effects = self
                    .engine
                    .abort(
                        &context.user_id,
                        &context.room_id,
                        context.username.as_deref(),
                    )
                    .await?;
                effects::deliver(effects, &self.notifier).await?;
                Ok(())
            }
            "create" => {
                // A bare create with an interaction trigger opens the form
                // front end; without one the chat flow needs a title.
                if context.trigger_id.is_some() {
                    return self.open_create_modal(context).await;
                }
                self.notice(
                    context,
                    "Invalid syntax. Creation uses: `/incident create <title of incident>`",
                )
                .await
            }
            "describe" => {
                self.notice(
                    context,
                    "Invalid syntax. Describing uses: `/incident describe <brief description of the incident>`",
                )
                .await
            }
            "explain" => {
                self.notice(
                    context,
                    "Invalid syntax. Explaining uses: `/incident explain <brief explanation of the update>`",
                )
                .await
            }
            "update" => {
                self.notice(
                    context,
                    "Invalid syntax. Update uses: `/incident update <id of incident>`",
                )
                .await
            }
            "close" => {
                self.notice(
                    context,
                    "Invalid syntax. Close uses: `/incident close <id of incident>`",
                )
                .await
            }
            _ => self.notice(context, USAGE).await,
        }
    }

    async fn handle_two_arguments(
        &self,
        context: &CommandContext,
        args: &[String],
    ) -> Result<(), CommandError> {
        match args[0].to_lowercase().as_str() {
            "create" | "describe" | "explain" => self.handle_many_arguments(context, args).await,
            "abort" => self.handle_one_argument(context, &args[0]).await,
            "update" => {
                let Ok(incident_id) = args[1].parse::<u64>() else {
                    return self.notice(context, "Please inform a valid incident").await;
                };

                let key = DraftKey::update(&context.user_id, &context.room_id);
                let effects = self
                    .engine
                    .handle(
                        &key,
                        WorkflowEvent::BeginUpdate {
                            incident_id,
                            actor_name: context.username.clone(),
                        },
                    )
                    .await?;
                effects::deliver(effects, &self.notifier).await?;
                Ok(())
            }
            "close" => {
                let Ok(incident_id) = args[1].parse::<u64>() else {
                    return self.notice(context, "Please inform a valid incident").await;
                };

                match self
                    .modals
                    .open_close(
                        &context.user_id,
                        context.username.as_deref(),
                        &context.room_id,
                        incident_id,
                    )
                    .await
                {
                    Ok(_) => Ok(()),
                    Err(ModalError::Backend(error)) => {
                        info!(incident_id, %error, "Close refused, incident lookup failed");
                        self.notice(context, "Please inform a valid incident").await
                    }
                    Err(error) => {
                        warn!(%error, "Could not open the close form");
                        self.notice(
                            context,
                            "An error occured during the incident close request. Please, try again later",
                        )
                        .await
                    }
                }
            }
            _ => self.notice(context, USAGE).await,
        }
    }

    async fn handle_many_arguments(
        &self,
        context: &CommandContext,
        args: &[String],
    ) -> Result<(), CommandError> {
        let rest = args[1..].join(" ");

        match args[0].to_lowercase().as_str() {
            "create" => {
                let key = DraftKey::incident(&context.user_id, &context.room_id);
                let effects = self
                    .engine
                    .handle(&key, WorkflowEvent::Begin { title: rest })
                    .await?;
                effects::deliver(effects, &self.notifier).await?;
                Ok(())
            }
            "describe" => {
                let key = DraftKey::incident(&context.user_id, &context.room_id);
                let effects = self
                    .engine
                    .handle(&key, WorkflowEvent::Describe { message: rest })
                    .await?;
                effects::deliver(effects, &self.notifier).await?;
                Ok(())
            }
            "explain" => {
                let key = DraftKey::update(&context.user_id, &context.room_id);
                let effects = self
                    .engine
                    .handle(&key, WorkflowEvent::Explain { message: rest })
                    .await?;
                effects::deliver(effects, &self.notifier).await?;
                Ok(())
            }
            "abort" => self.handle_one_argument(context, &args[0]).await,
            _ => self.notice(context, USAGE).await,
        }
    }

    async fn open_create_modal(&self, context: &CommandContext) -> Result<(), CommandError> {
        match self
            .modals
            .open_create(
                &context.user_id,
                context.username.as_deref(),
                &context.room_id,
                context.room_members.clone(),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(error) => {
                warn!(%error, "Could not open the create form");
                self.notice(
                    context,
                    "An error occured during the incident creation request. Please, try again later",
                )
                .await
            }
        }
    }

    async fn notice(
        &self,
        context: &CommandContext,
        text: impl Into<String>,
    ) -> Result<(), CommandError> {
        self.notifier
            .notify(
                &context.user_id,
                ChatMessage::new(&context.room_id, &self.alias, text),
            )
            .await?;
        Ok(())
    }
}
