//! Event model for the Alexis bot.
//!
//! The gateway hands the runtime fully typed [`Event`]s. Every event has a
//! stable [`name`](Event::name) that handlers subscribe to, and exposes the
//! pieces the dispatcher needs to build an invocation: the author, the
//! channel, the server and the raw message text.
//!
//! # Event names
//!
//! | Variant | Name |
//! |---------|------|
//! | [`Event::MessageCreated`] | `message` |
//! | [`Event::MessageEdited`] | `message_edit` |
//! | [`Event::MessageDeleted`] | `message_delete` |
//! | [`Event::ReactionAdded`] | `reaction_add` |
//! | [`Event::ReactionRemoved`] | `reaction_remove` |
//! | [`Event::ReactionCleared`] | `reaction_clear` |
//! | [`Event::MemberJoined`] | `member_join` |
//! | [`Event::MemberLeft`] | `member_remove` |
//! | [`Event::MemberUpdated`] | `member_update` |
//! | [`Event::MemberBanned`] | `member_ban` |
//! | [`Event::MemberUnbanned`] | `member_unban` |
//! | [`Event::ServerJoined`] | `server_join` |
//! | [`Event::ServerLeft`] | `server_remove` |
//! | [`Event::TypingStarted`] | `typing` |
//! | [`Event::Ready`] | `ready` |

use serde::{Deserialize, Serialize};

/// A platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Platform-wide unique id.
    pub id: String,
    /// Account name.
    pub name: String,
    /// Whether the account is a bot account.
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Creates a non-bot user.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            bot: false,
        }
    }

    /// Returns the mention markup for this user (`<@id>`).
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// A server role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
}

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A user as seen inside one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user: User,
    /// The id of the server this membership belongs to.
    pub server_id: String,
    /// Server-specific nickname.
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Whether the member holds the administrator capability.
    #[serde(default)]
    pub administrator: bool,
}

impl Member {
    /// Creates a member without roles or nickname.
    pub fn new(user: User, server_id: impl Into<String>) -> Self {
        Self {
            user,
            server_id: server_id.into(),
            nick: None,
            roles: Vec::new(),
            administrator: false,
        }
    }

    /// Adds a role (builder pattern).
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    /// Sets the administrator capability (builder pattern).
    pub fn with_administrator(mut self, administrator: bool) -> Self {
        self.administrator = administrator;
        self
    }

    pub fn id(&self) -> &str {
        &self.user.id
    }

    /// Nickname if set, account name otherwise.
    pub fn display_name(&self) -> &str {
        self.nick.as_deref().unwrap_or(&self.user.name)
    }

    /// Returns `true` if the member has a role whose id or name equals `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.id == role || r.name == role)
    }
}

/// A conversation a message can be posted into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    /// `None` for private (direct message) channels.
    #[serde(default)]
    pub server_id: Option<String>,
}

impl Channel {
    /// A channel belonging to a server.
    pub fn server(id: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            server_id: Some(server_id.into()),
        }
    }

    /// A private (direct message) channel.
    pub fn private(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            server_id: None,
        }
    }

    pub fn is_private(&self) -> bool {
        self.server_id.is_none()
    }
}

/// An attachment on a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(default)]
    pub filename: String,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub author: User,
    /// The author's membership when the message was posted in a server.
    #[serde(default)]
    pub member: Option<Member>,
    pub channel: Channel,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Creates a message with no member information or attachments.
    pub fn new(
        id: impl Into<String>,
        channel: Channel,
        author: User,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            author,
            member: None,
            channel,
            attachments: Vec::new(),
        }
    }

    /// Attaches the author's membership (builder pattern).
    pub fn with_member(mut self, member: Member) -> Self {
        self.member = Some(member);
        self
    }

    /// Adds an attachment (builder pattern).
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn is_private(&self) -> bool {
        self.channel.is_private()
    }
}

/// An event delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    MessageCreated(Message),
    MessageEdited { before: Message, after: Message },
    MessageDeleted(Message),
    ReactionAdded { message: Message, emoji: String, user: User },
    ReactionRemoved { message: Message, emoji: String, user: User },
    ReactionCleared { message: Message },
    MemberJoined(Member),
    MemberLeft(Member),
    MemberUpdated { before: Member, after: Member },
    MemberBanned(Member),
    MemberUnbanned { server_id: String, user: User },
    ServerJoined { server_id: String },
    ServerLeft { server_id: String },
    TypingStarted { channel: Channel, user: User },
    /// The gateway finished connecting.
    Ready,
}

impl Event {
    /// The subscription name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageCreated(_) => "message",
            Self::MessageEdited { .. } => "message_edit",
            Self::MessageDeleted(_) => "message_delete",
            Self::ReactionAdded { .. } => "reaction_add",
            Self::ReactionRemoved { .. } => "reaction_remove",
            Self::ReactionCleared { .. } => "reaction_clear",
            Self::MemberJoined(_) => "member_join",
            Self::MemberLeft(_) => "member_remove",
            Self::MemberUpdated { .. } => "member_update",
            Self::MemberBanned(_) => "member_ban",
            Self::MemberUnbanned { .. } => "member_unban",
            Self::ServerJoined { .. } => "server_join",
            Self::ServerLeft { .. } => "server_remove",
            Self::TypingStarted { .. } => "typing",
            Self::Ready => "ready",
        }
    }

    /// Returns the message when this is a newly created message, the only
    /// event kind that goes through command parsing.
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::MessageCreated(message) => Some(message),
            _ => None,
        }
    }

    /// The message this event refers to, if any.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::MessageCreated(message) | Self::MessageDeleted(message) => Some(message),
            Self::MessageEdited { after, .. } => Some(after),
            Self::ReactionAdded { message, .. }
            | Self::ReactionRemoved { message, .. }
            | Self::ReactionCleared { message } => Some(message),
            _ => None,
        }
    }

    /// The user who caused the event.
    pub fn caller(&self) -> Option<&User> {
        match self {
            Self::MessageCreated(message) | Self::MessageDeleted(message) => Some(&message.author),
            Self::MessageEdited { after, .. } => Some(&after.author),
            Self::ReactionAdded { user, .. }
            | Self::ReactionRemoved { user, .. }
            | Self::TypingStarted { user, .. }
            | Self::MemberUnbanned { user, .. } => Some(user),
            Self::MemberJoined(member) | Self::MemberLeft(member) | Self::MemberBanned(member) => {
                Some(&member.user)
            }
            Self::MemberUpdated { after, .. } => Some(&after.user),
            Self::ReactionCleared { .. }
            | Self::ServerJoined { .. }
            | Self::ServerLeft { .. }
            | Self::Ready => None,
        }
    }

    /// The caller's membership, when the event carries one.
    pub fn member(&self) -> Option<&Member> {
        match self {
            Self::MemberJoined(member) | Self::MemberLeft(member) | Self::MemberBanned(member) => {
                Some(member)
            }
            Self::MemberUpdated { after, .. } => Some(after),
            Self::MessageCreated(message) | Self::MessageDeleted(message) => {
                message.member.as_ref()
            }
            Self::MessageEdited { after, .. } => after.member.as_ref(),
            _ => None,
        }
    }

    /// The channel the event happened in.
    pub fn channel(&self) -> Option<&Channel> {
        match self {
            Self::TypingStarted { channel, .. } => Some(channel),
            _ => self.message().map(|message| &message.channel),
        }
    }

    /// The server the event belongs to; `None` for private or global events.
    pub fn server_id(&self) -> Option<&str> {
        match self {
            Self::ServerJoined { server_id }
            | Self::ServerLeft { server_id }
            | Self::MemberUnbanned { server_id, .. } => Some(server_id),
            Self::MemberJoined(member)
            | Self::MemberLeft(member)
            | Self::MemberBanned(member)
            | Self::MemberUpdated { after: member, .. } => Some(&member.server_id),
            _ => self.channel().and_then(|channel| channel.server_id.as_deref()),
        }
    }

    /// The raw message text, or an empty string for events without text.
    pub fn text(&self) -> &str {
        self.message().map_or("", |message| message.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(channel: Channel) -> Message {
        Message::new("m1", channel, User::new("u1", "alice"), "!ping")
    }

    #[test]
    fn test_event_names() {
        let msg = message(Channel::private("c1"));
        assert_eq!(Event::MessageCreated(msg.clone()).name(), "message");
        assert_eq!(
            Event::ReactionCleared { message: msg }.name(),
            "reaction_clear"
        );
        assert_eq!(
            Event::TypingStarted {
                channel: Channel::private("c1"),
                user: User::new("u1", "alice"),
            }
            .name(),
            "typing"
        );
        assert_eq!(Event::Ready.name(), "ready");
    }

    #[test]
    fn test_only_created_messages_are_parsed() {
        let msg = message(Channel::server("c1", "s1"));
        assert!(Event::MessageCreated(msg.clone()).as_message().is_some());
        assert!(Event::MessageDeleted(msg.clone()).as_message().is_none());
        assert_eq!(Event::MessageDeleted(msg).text(), "!ping");
    }

    #[test]
    fn test_server_resolution() {
        let member = Member::new(User::new("u1", "alice"), "s9");
        assert_eq!(Event::MemberJoined(member).server_id(), Some("s9"));

        let private = Event::MessageCreated(message(Channel::private("c1")));
        assert_eq!(private.server_id(), None);

        let public = Event::MessageCreated(message(Channel::server("c1", "s1")));
        assert_eq!(public.server_id(), Some("s1"));
        assert_eq!(public.caller().map(|u| u.id.as_str()), Some("u1"));
    }

    #[test]
    fn test_member_display_name_and_roles() {
        let mut member = Member::new(User::new("u1", "alice"), "s1")
            .with_role(Role::new("r1", "mods"));
        assert_eq!(member.display_name(), "alice");
        member.nick = Some("Al".into());
        assert_eq!(member.display_name(), "Al");
        assert!(member.has_role("r1"));
        assert!(member.has_role("mods"));
        assert!(!member.has_role("admins"));
    }
}
