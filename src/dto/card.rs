use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::trivia::ChannelId;

/// What a card represents, so adapters can style or track it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    /// A question with its shuffled options; adapters attach the reactions.
    Question,
    /// The answer reveal closing a round.
    Reveal,
    /// Plain informational notice.
    Notice,
    /// End-of-match scoreboard.
    Scoreboard,
    /// Global cross-match leaderboard.
    Leaderboard,
}

/// Author line rendered above a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CardAuthor {
    pub name: String,
    pub icon_url: String,
}

/// Titled block of text inside a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CardField {
    pub name: String,
    pub value: String,
}

/// Structured message handed to the presentation layer, which owns rendering.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Card {
    /// Card kind.
    pub kind: CardKind,
    /// Channel the card must be posted in; absent for cards only returned over HTTP.
    pub channel_id: Option<ChannelId>,
    /// Match the card belongs to, when any.
    pub match_id: Option<Uuid>,
    /// 1-based round number for question and reveal cards.
    pub round: Option<u32>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Accent color (RGB).
    pub color: Option<u32>,
    pub thumbnail_url: Option<String>,
    pub author: Option<CardAuthor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<CardField>,
    /// Reactions the adapter must attach, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<String>,
    /// Visible countdown for question cards.
    pub countdown_secs: Option<u64>,
    /// Seconds after which the adapter deletes the posted card.
    pub delete_after_secs: Option<u64>,
}

impl Card {
    /// Empty card of `kind`, not bound to any channel yet.
    pub fn new(kind: CardKind) -> Self {
        Self {
            kind,
            channel_id: None,
            match_id: None,
            round: None,
            title: None,
            description: None,
            color: None,
            thumbnail_url: None,
            author: None,
            fields: Vec::new(),
            reactions: Vec::new(),
            countdown_secs: None,
            delete_after_secs: None,
        }
    }

    /// Plain text notice.
    pub fn notice(channel_id: ChannelId, message: impl Into<String>) -> Self {
        Self::new(CardKind::Notice)
            .in_channel(channel_id)
            .with_description(message)
    }

    pub fn in_channel(mut self, channel_id: ChannelId) -> Self {
        self.channel_id = Some(channel_id);
        self
    }

    pub fn with_match(mut self, match_id: Uuid) -> Self {
        self.match_id = Some(match_id);
        self
    }

    pub fn with_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_thumbnail(mut self, url: Option<String>) -> Self {
        self.thumbnail_url = url;
        self
    }

    pub fn with_author(mut self, name: impl Into<String>, icon_url: impl Into<String>) -> Self {
        self.author = Some(CardAuthor {
            name: name.into(),
            icon_url: icon_url.into(),
        });
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(CardField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Countdown shown on the card and the delay after which it is removed.
    pub fn with_timing(mut self, countdown_secs: Option<u64>, delete_after_secs: u64) -> Self {
        self.countdown_secs = countdown_secs;
        self.delete_after_secs = Some(delete_after_secs);
        self
    }

    pub fn with_reactions(mut self, reactions: Vec<String>) -> Self {
        self.reactions = reactions;
        self
    }
}
