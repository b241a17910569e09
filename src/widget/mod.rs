//! Client-side chat widget model.
//!
//! Owns the visible conversation and the panel/scroll state for one widget
//! instance. Every request goes through a [`ChatBackend`]; failures end up
//! as a friendly assistant message and are never returned to the caller.

pub mod backend;
pub mod prompt;
pub mod state;

use chrono::{ DateTime, Utc };
use log::{ debug, info, warn };
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::site::SiteContext;
use crate::models::chat::{ ChatMessage, ChatRequest, Role, DEFAULT_TEMPERATURE, DEFAULT_TOP_P };
use self::backend::{ BackendError, ChatBackend };
use self::prompt::system_prompt;
use self::state::{ PanelEvent, PanelState, ScrollMetrics, ScrollState };

pub const NO_REPLY_MESSAGE: &str = "Sorry, I can't reply right now.";
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Sorry, something went wrong while connecting to the AI service. Please try again later.";
pub const SITE_REFRESHED_MESSAGE: &str = "✓ Website information refreshed";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WidgetMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl WidgetMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

pub struct ChatWidget {
    site: SiteContext,
    messages: Vec<WidgetMessage>,
    panel: PanelState,
    scroll: ScrollState,
    typing: bool,
    temperature: f64,
    top_p: f64,
}

impl ChatWidget {
    pub fn new(site: SiteContext) -> Self {
        Self {
            site,
            messages: Vec::new(),
            panel: PanelState::default(),
            scroll: ScrollState::default(),
            typing: false,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }

    pub fn messages(&self) -> &[WidgetMessage] {
        &self.messages
    }

    pub fn panel(&self) -> PanelState {
        self.panel
    }

    pub fn dispatch(&mut self, event: PanelEvent) -> PanelState {
        let next = self.panel.transition(event);
        if next != self.panel {
            debug!("Chat panel {:?} -> {:?}", self.panel, next);
            if next.shows_messages() {
                self.scroll.begin_auto_scroll();
            }
        }
        self.panel = next;
        next
    }

    pub fn scroll(&self) -> &ScrollState {
        &self.scroll
    }

    pub fn on_scroll(&mut self, metrics: ScrollMetrics) {
        self.scroll.on_scroll(metrics);
    }

    /// The scroll-to-bottom button: hides it and starts a programmatic scroll.
    pub fn scroll_to_bottom(&mut self) {
        self.scroll.begin_auto_scroll();
    }

    pub fn on_auto_scroll_finished(&mut self) {
        self.scroll.end_auto_scroll();
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn site(&self) -> &SiteContext {
        &self.site
    }

    /// Swaps in freshly loaded site information and confirms it in the
    /// conversation. Later requests build their system prompt from it.
    pub fn refresh_site(&mut self, site: SiteContext) -> &WidgetMessage {
        info!("Website information refreshed ({} headings)", site.headings.len());
        self.site = site;
        self.push(WidgetMessage::new(Role::Assistant, SITE_REFRESHED_MESSAGE))
    }

    /// Appends the user's message and returns the request to send, or
    /// `None` when the input is blank or a reply is still pending.
    pub fn begin_submit(&mut self, text: &str) -> Option<ChatRequest> {
        let question = text.trim();
        if question.is_empty() {
            return None;
        }
        if self.typing {
            debug!("Ignoring submit while a reply is pending");
            return None;
        }

        let mut messages = Vec::with_capacity(self.messages.len() + 2);
        messages.push(ChatMessage::system(system_prompt(&self.site)));
        messages.extend(
            self.messages.iter().map(|m| ChatMessage::new(m.role, m.content.clone()))
        );
        messages.push(ChatMessage::user(question));

        self.push(WidgetMessage::new(Role::User, question));
        self.typing = true;

        Some(ChatRequest {
            messages,
            temperature: self.temperature,
            top_p: self.top_p,
        })
    }

    /// Appends exactly one assistant message for the outcome of a request.
    pub fn finish_submit(&mut self, outcome: Result<Value, BackendError>) -> &WidgetMessage {
        let content = match outcome {
            Ok(payload) => extract_reply(&payload).unwrap_or_else(|| NO_REPLY_MESSAGE.to_string()),
            Err(e) => {
                warn!("AI call failed: {}", e);
                CONNECTION_ERROR_MESSAGE.to_string()
            }
        };
        self.typing = false;
        self.push(WidgetMessage::new(Role::Assistant, content))
    }

    pub async fn submit<B>(&mut self, text: &str, backend: &B) -> Option<&WidgetMessage>
        where B: ChatBackend + ?Sized
    {
        let request = self.begin_submit(text)?;
        let outcome = backend.complete(&request).await;
        Some(self.finish_submit(outcome))
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.scroll = ScrollState::default();
    }

    fn push(&mut self, message: WidgetMessage) -> &WidgetMessage {
        self.messages.push(message);
        self.scroll.begin_auto_scroll();
        &self.messages[self.messages.len() - 1]
    }
}

/// Pulls `choices[0].message.content` out of a completion payload.
pub fn extract_reply(payload: &Value) -> Option<String> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|content| !content.trim().is_empty())
        .map(str::to_owned)
}
