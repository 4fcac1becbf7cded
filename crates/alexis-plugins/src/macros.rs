//! User-defined macros.
//!
//! Two kinds of macro live in the record store:
//!
//! - **text macros** in [`MACROS_SET`], keyed by name and shared by every
//!   server
//! - **embed macros** in [`EMBED_MACROS_SET`], keyed by `scope/name` where
//!   the scope is the server id, or `global` in private conversations
//!
//! A macro is used by sending `!name`, `! name` or `¡name`, where `!` stands
//! for the server's command prefix. When both kinds exist under the same
//! name the embed macro wins.

use std::sync::Arc;

use alexis_core::{BoxedStore, Embed};
use alexis_framework::parser::parse_user_mention;
use alexis_framework::{BoxedHandler, CommandContext, Handler, HandlerResult, HandlerSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Record set holding text macros.
pub const MACROS_SET: &str = "macros";
/// Record set holding embed macros.
pub const EMBED_MACROS_SET: &str = "embed_macros";
/// Scope of embed macros defined in private conversations.
pub const GLOBAL_SCOPE: &str = "global";

const MESSAGE_LIMIT: usize = 2000;
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];

/// Named embed colours accepted by [`parse_colour`].
const NAMED_COLOURS: &[(&str, u32)] = &[
    ("default", 0x000000),
    ("teal", 0x1abc9c),
    ("dark_teal", 0x11806a),
    ("green", 0x2ecc71),
    ("dark_green", 0x1f8b4c),
    ("blue", 0x3498db),
    ("dark_blue", 0x206694),
    ("purple", 0x9b59b6),
    ("dark_purple", 0x71368a),
    ("gold", 0xf1c40f),
    ("dark_gold", 0xc27c0e),
    ("orange", 0xe67e22),
    ("dark_orange", 0xa84300),
    ("red", 0xe74c3c),
    ("dark_red", 0x992d22),
    ("lighter_grey", 0x95a5a6),
    ("dark_grey", 0x607d8b),
    ("light_grey", 0x979c9f),
    ("darker_grey", 0x546e7a),
];

/// A stored text macro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMacro {
    pub content: String,
}

/// A stored embed macro.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedMacro {
    pub name: String,
    pub scope: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub colour: u32,
    #[serde(default)]
    pub used_count: u64,
}

impl EmbedMacro {
    pub fn to_embed(&self) -> Embed {
        let mut embed = Embed::new().colour(self.colour);
        if !self.image_url.is_empty() {
            embed = embed.image(&self.image_url);
        }
        if !self.title.is_empty() {
            embed = embed.title(&self.title);
        }
        if !self.description.is_empty() {
            embed = embed.description(&self.description);
        }
        embed
    }
}

/// Parses `#rrggbb`, `rrggbb` or one of the named colours (`dark teal`
/// and `dark_teal` are the same).
pub fn parse_colour(value: &str) -> Option<u32> {
    let value = value.trim();
    let hex = value.strip_prefix('#').unwrap_or(value);
    if hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return u32::from_str_radix(hex, 16).ok();
    }

    let name = value.to_lowercase().replace(' ', "_");
    NAMED_COLOURS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|&(_, colour)| colour)
}

/// All macro handlers.
pub fn handlers() -> Vec<BoxedHandler> {
    vec![
        Arc::new(MacroSet::new()),
        Arc::new(MacroUnset::new()),
        Arc::new(MacroList::new()),
        Arc::new(EmbedMacroSet::new()),
        Arc::new(EmbedMacroUnset::new()),
        Arc::new(EmbedMacroSetColour::new()),
        Arc::new(MacroUse::new()),
    ]
}

// ============================================================================
// Helpers
// ============================================================================

fn scope(ctx: &CommandContext) -> &str {
    match ctx.server_id() {
        Some(server_id) if !ctx.is_private() => server_id,
        _ => GLOBAL_SCOPE,
    }
}

fn embed_key(scope: &str, name: &str) -> String {
    format!("{scope}/{name}")
}

fn clean_name(name: &str) -> String {
    name.replace('\\', "")
}

async fn load_embed(records: &BoxedStore, key: &str) -> anyhow::Result<Option<EmbedMacro>> {
    match records.get(EMBED_MACROS_SET, key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

async fn save_embed(records: &BoxedStore, key: &str, embed: &EmbedMacro) -> anyhow::Result<bool> {
    Ok(records
        .put(EMBED_MACROS_SET, key, serde_json::to_value(embed)?)
        .await?)
}

/// First attachment of the triggering message that looks like an image.
fn image_attachment(ctx: &CommandContext) -> Option<String> {
    ctx.event()
        .as_message()?
        .attachments
        .iter()
        .map(|attachment| attachment.url.as_str())
        .find(|url| {
            let lower = url.to_lowercase();
            IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        })
        .map(str::to_string)
}

fn has_attachments(ctx: &CommandContext) -> bool {
    ctx.event()
        .as_message()
        .is_some_and(|message| !message.attachments.is_empty())
}

/// Macro names that are user mentions are listed as `*\@Display Name*`.
async fn listed_name(ctx: &CommandContext, name: &str) -> String {
    let Some(user_id) = parse_user_mention(name) else {
        return name.to_string();
    };
    match ctx.resolve_member(user_id).await.ok().flatten() {
        Some(member) => format!("*\\@{}*", member.display_name()),
        None => format!("*\\@<@{user_id}>*"),
    }
}

// ============================================================================
// Text macros
// ============================================================================

/// `set <name> <content>`: creates or replaces a text macro.
pub struct MacroSet {
    spec: HandlerSpec,
}

impl MacroSet {
    pub fn new() -> Self {
        Self {
            spec: HandlerSpec::command("set").owner_only(true),
        }
    }
}

impl Default for MacroSet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for MacroSet {
    fn spec(&self) -> &HandlerSpec {
        &self.spec
    }

    async fn handle(&self, ctx: Arc<CommandContext>) -> HandlerResult {
        if ctx.argc() < 2 {
            ctx.answer(format!("usage: {}set <name> <content>", ctx.prefix()))
                .await?;
            return Ok(());
        }

        let name = &ctx.argv()[0];
        let content = ctx.argv()[1..].join(" ");
        let record = serde_json::to_value(TextMacro {
            content: content.clone(),
        })?;
        let created = ctx.records().put(MACROS_SET, name, record).await?;

        if created {
            info!(name = %name, content = %content, "Macro created");
            ctx.answer(format!("macro **{name}** created")).await?;
        } else {
            info!(name = %name, content = %content, "Macro updated");
            ctx.answer(format!("macro **{name}** updated")).await?;
        }
        Ok(())
    }
}

/// `unset <name>`: removes a text macro.
pub struct MacroUnset {
    spec: HandlerSpec,
}

impl MacroUnset {
    pub fn new() -> Self {
        Self {
            spec: HandlerSpec::command("unset").owner_only(true),
        }
    }
}

impl Default for MacroUnset {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for MacroUnset {
    fn spec(&self) -> &HandlerSpec {
        &self.spec
    }

    async fn handle(&self, ctx: Arc<CommandContext>) -> HandlerResult {
        let Some(name) = ctx.argv().first().map(|name| clean_name(name)) else {
            ctx.answer(format!("usage: {}unset <name>", ctx.prefix()))
                .await?;
            return Ok(());
        };

        if ctx.records().delete(MACROS_SET, &name).await? {
            info!(name = %name, "Macro removed");
            ctx.answer(format!("macro **{name}** removed")).await?;
        } else {
            ctx.answer(format!("macro **{name}** does not exist")).await?;
        }
        Ok(())
    }
}

/// `list`: names of the text macros and of this scope's embed macros.
pub struct MacroList {
    spec: HandlerSpec,
}

impl MacroList {
    pub fn new() -> Self {
        Self {
            spec: HandlerSpec::command("list").allow_private(false),
        }
    }
}

impl Default for MacroList {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for MacroList {
    fn spec(&self) -> &HandlerSpec {
        &self.spec
    }

    async fn handle(&self, ctx: Arc<CommandContext>) -> HandlerResult {
        ctx.typing().await?;

        let mut names = Vec::new();
        for (key, _) in ctx.records().list(MACROS_SET).await? {
            names.push(listed_name(&ctx, &key).await);
        }

        let scope_prefix = format!("{}/", scope(&ctx));
        for (key, _) in ctx.records().list(EMBED_MACROS_SET).await? {
            let Some(name) = key.strip_prefix(&scope_prefix) else {
                continue;
            };
            let name = listed_name(&ctx, name).await;
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names.sort();

        let mut reply = match names.len() {
            1 => "there is 1 macro:".to_string(),
            n => format!("there are {n} macros:"),
        };
        for (i, name) in names.iter().enumerate() {
            if reply.len() + 2 + name.len() > MESSAGE_LIMIT {
                ctx.answer(std::mem::replace(&mut reply, name.clone()))
                    .await?;
            } else {
                reply.push_str(if i == 0 { " " } else { ", " });
                reply.push_str(name);
            }
        }
        if !reply.is_empty() {
            ctx.answer(reply.trim()).await?;
        }
        Ok(())
    }
}

// ============================================================================
// Embed macros
// ============================================================================

/// `iset <name> [image]|[title]|[description]|[colour]`.
///
/// An image attached to the command replaces the first field.
pub struct EmbedMacroSet {
    spec: HandlerSpec,
}

impl EmbedMacroSet {
    pub fn new() -> Self {
        Self {
            spec: HandlerSpec::command("iset").owner_only(true),
        }
    }
}

impl Default for EmbedMacroSet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for EmbedMacroSet {
    fn spec(&self) -> &HandlerSpec {
        &self.spec
    }

    async fn handle(&self, ctx: Arc<CommandContext>) -> HandlerResult {
        let required = if has_attachments(&ctx) { 1 } else { 2 };
        if ctx.argc() < required {
            ctx.answer(format!(
                "usage: {}iset <name> [image_url]|[title]|[description]|[colour]\n\
                 The first field is ignored when an image is attached to the command.",
                ctx.prefix()
            ))
            .await?;
            return Ok(());
        }

        let name = ctx.argv()[0].clone();
        let mut fields: Vec<String> = ctx.argv()[1..]
            .join(" ")
            .split('|')
            .map(|field| field.trim().to_string())
            .collect();
        if let Some(url) = image_attachment(&ctx) {
            fields[0] = url;
        }
        let field = |i: usize| fields.get(i).cloned().unwrap_or_default();

        let colour = match fields.get(3).filter(|colour| !colour.is_empty()) {
            Some(value) => match parse_colour(value) {
                Some(colour) => colour,
                None => {
                    ctx.answer("invalid colour").await?;
                    return Ok(());
                }
            },
            None => 0,
        };

        let (image_url, title, description) = (field(0), field(1), field(2));
        if image_url.is_empty() && title.is_empty() && description.is_empty() {
            ctx.answer("at least an image, a title or a description is required")
                .await?;
            return Ok(());
        }

        let scope = scope(&ctx).to_string();
        let key = embed_key(&scope, &name);
        let existing = load_embed(ctx.records(), &key).await?;
        let created = existing.is_none();
        let embed = EmbedMacro {
            name: name.clone(),
            scope,
            image_url,
            title,
            description,
            colour,
            used_count: existing.map_or(0, |existing| existing.used_count),
        };
        save_embed(ctx.records(), &key, &embed).await?;

        info!(key = %key, created, "Embed macro saved");
        let verb = if created { "created" } else { "updated" };
        ctx.answer(format!("macro **{name}** {verb}")).await?;
        Ok(())
    }
}

/// `iunset <name>`: removes an embed macro of this scope.
pub struct EmbedMacroUnset {
    spec: HandlerSpec,
}

impl EmbedMacroUnset {
    pub fn new() -> Self {
        Self {
            spec: HandlerSpec::command("iunset").owner_only(true),
        }
    }
}

impl Default for EmbedMacroUnset {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for EmbedMacroUnset {
    fn spec(&self) -> &HandlerSpec {
        &self.spec
    }

    async fn handle(&self, ctx: Arc<CommandContext>) -> HandlerResult {
        let Some(name) = ctx.argv().first().map(|name| clean_name(name)) else {
            ctx.answer(format!("usage: {}iunset <name>", ctx.prefix()))
                .await?;
            return Ok(());
        };

        let key = embed_key(scope(&ctx), &name);
        if ctx.records().delete(EMBED_MACROS_SET, &key).await? {
            info!(key = %key, "Embed macro removed");
            ctx.answer(format!("macro **{name}** removed")).await?;
        } else {
            ctx.answer(format!("macro **{name}** does not exist")).await?;
        }
        Ok(())
    }
}

/// `isetcolour <name> [colour]`: the colour defaults to `default`.
pub struct EmbedMacroSetColour {
    spec: HandlerSpec,
}

impl EmbedMacroSetColour {
    pub fn new() -> Self {
        Self {
            spec: HandlerSpec::command("isetcolour")
                .alias("isetcolor")
                .owner_only(true),
        }
    }
}

impl Default for EmbedMacroSetColour {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for EmbedMacroSetColour {
    fn spec(&self) -> &HandlerSpec {
        &self.spec
    }

    async fn handle(&self, ctx: Arc<CommandContext>) -> HandlerResult {
        let Some(name) = ctx.argv().first().map(|name| clean_name(name)) else {
            ctx.answer(format!("usage: {}isetcolour <name> <colour=default>", ctx.prefix()))
                .await?;
            return Ok(());
        };

        let colour = if ctx.argc() > 1 {
            match parse_colour(&ctx.argv()[1..].join(" ")) {
                Some(colour) => colour,
                None => {
                    ctx.answer("invalid colour").await?;
                    return Ok(());
                }
            }
        } else {
            0
        };

        let key = embed_key(scope(&ctx), &name);
        let Some(mut embed) = load_embed(ctx.records(), &key).await? else {
            ctx.answer(format!("macro **{name}** does not exist")).await?;
            return Ok(());
        };
        embed.colour = colour;
        save_embed(ctx.records(), &key, &embed).await?;

        ctx.answer(format!("colour of macro **{name}** updated"))
            .await?;
        Ok(())
    }
}

// ============================================================================
// Macro use
// ============================================================================

/// Answers `!name`, `! name` and `¡name` with the macro called `name`,
/// `!` being the command prefix in effect for the message.
///
/// Stops the other prefix handlers once it ran.
pub struct MacroUse {
    spec: HandlerSpec,
}

impl MacroUse {
    pub fn new() -> Self {
        Self {
            spec: HandlerSpec::new("macro-use")
                .on_command_prefix()
                .prefix("¡")
                .short_circuit(true),
        }
    }
}

impl Default for MacroUse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for MacroUse {
    fn spec(&self) -> &HandlerSpec {
        &self.spec
    }

    async fn handle(&self, ctx: Arc<CommandContext>) -> HandlerResult {
        let raw = ctx.raw_text();
        let Some(prefix) = self.spec.matched_trigger(raw, ctx.prefix()) else {
            return Ok(());
        };
        let Some(name) = raw[prefix.len()..].split_whitespace().next() else {
            return Ok(());
        };

        let key = embed_key(scope(&ctx), name);
        if let Some(mut embed) = load_embed(ctx.records(), &key).await? {
            embed.used_count += 1;
            save_embed(ctx.records(), &key, &embed).await?;
            ctx.answer_embed(embed.to_embed()).await?;
            return Ok(());
        }

        if let Some(record) = ctx.records().get(MACROS_SET, name).await? {
            let text: TextMacro = serde_json::from_value(record)?;
            ctx.answer(text.content).await?;
        }
        Ok(())
    }
}
