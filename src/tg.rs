use crate::config::Config;
use crate::tmdb::{self, MediaDetail, MediaKind, SearchEntry, TmdbClient};
use std::sync::Arc;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    prelude::*,
    types::{
        CallbackQuery, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode,
    },
    utils::command::BotCommands,
};

/// Telegram's ceiling for photo captions.
const CAPTION_LIMIT: usize = 1024;

const MSG_UNAUTHORIZED: &str = "Sorry, you are not authorized to use this bot.";
const MSG_WELCOME: &str =
    "Welcome! Send me the name of a movie, TV show, or series to get its poster.";
const MSG_EMPTY_QUERY: &str = "Please provide a movie or TV show name.";
const MSG_NO_RESULTS: &str = "No results found for your query.";
const MSG_NO_ELIGIBLE: &str = "No movies or TV shows found.";
const MSG_PICK_ONE: &str = "Multiple results found. Please select one:";
const MSG_SEARCH_ERROR: &str = "An error occurred while fetching data. Please try again later.";
const MSG_DETAIL_ERROR: &str = "An error occurred while fetching details. Please try again later.";
const MSG_UNEXPECTED: &str = "An unexpected error occurred. Please try again later.";
const MSG_NO_OVERVIEW: &str = "No description available.";
const NOTE_NO_POSTER: &str = "No poster available for this media.";
const NOTE_POSTER_FAILED: &str = "Poster unavailable due to an error.";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    #[command(description = "show the welcome message")]
    Start,
}

pub async fn run(bot: Bot, config: Arc<Config>, tmdb: TmdbClient) {
    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(dptree::entry().filter_command::<Command>().endpoint({
                    let config = config.clone();
                    move |bot: Bot, msg: Message, cmd: Command| {
                        let config = config.clone();
                        async move { on_command(bot, msg, cmd, &config).await }
                    }
                }))
                .branch({
                    let config = config.clone();
                    let tmdb = tmdb.clone();
                    dptree::endpoint(move |bot: Bot, msg: Message| {
                        let config = config.clone();
                        let tmdb = tmdb.clone();
                        async move { on_search_text(bot, msg, &config, &tmdb).await }
                    })
                }),
        )
        .branch(Update::filter_callback_query().endpoint({
            let config = config.clone();
            move |bot: Bot, q: CallbackQuery| {
                let config = config.clone();
                let tmdb = tmdb.clone();
                async move { on_callback(bot, q, &config, &tmdb).await }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

/* ====== Endpoints ======
   Each endpoint delegates to a fallible handler; whatever escapes the
   handler is logged and answered with a generic apology, never re-raised
   into the dispatcher. */

async fn on_command(bot: Bot, msg: Message, cmd: Command, config: &Config) -> ResponseResult<()> {
    let chat = msg.chat.id;
    if let Err(err) = handle_command(&bot, &msg, cmd, config).await {
        report_unhandled(&bot, Some(chat), "command", &err).await;
    }
    Ok(())
}

async fn on_search_text(
    bot: Bot,
    msg: Message,
    config: &Config,
    tmdb: &TmdbClient,
) -> ResponseResult<()> {
    let chat = msg.chat.id;
    if let Err(err) = handle_search_text(&bot, &msg, config, tmdb).await {
        report_unhandled(&bot, Some(chat), "search", &err).await;
    }
    Ok(())
}

async fn on_callback(
    bot: Bot,
    q: CallbackQuery,
    config: &Config,
    tmdb: &TmdbClient,
) -> ResponseResult<()> {
    let chat = q.message.as_ref().map(|m| m.chat().id);
    if let Err(err) = handle_callback(&bot, &q, config, tmdb).await {
        report_unhandled(&bot, chat, "callback", &err).await;
    }
    Ok(())
}

/* ====== Handlers ====== */

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    cmd: Command,
    config: &Config,
) -> anyhow::Result<()> {
    match cmd {
        Command::Start => {
            if !check_access(bot, msg.chat.id, message_user_id(msg), config).await? {
                return Ok(());
            }
            bot.send_message(msg.chat.id, MSG_WELCOME).await?;
        }
    }
    Ok(())
}

async fn handle_search_text(
    bot: &Bot,
    msg: &Message,
    config: &Config,
    tmdb: &TmdbClient,
) -> anyhow::Result<()> {
    let chat = msg.chat.id;
    if !check_access(bot, chat, message_user_id(msg), config).await? {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let query = text.trim();
    if query.is_empty() {
        bot.send_message(chat, MSG_EMPTY_QUERY).await?;
        return Ok(());
    }
    // Unrecognized commands fall through the command filter; not a search.
    if query.starts_with('/') {
        return Ok(());
    }

    let raw = match tmdb.multi_search(query).await {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(error = %err, query, "tmdb search failed");
            bot.send_message(chat, MSG_SEARCH_ERROR).await?;
            return Ok(());
        }
    };

    if raw.is_empty() {
        bot.send_message(chat, MSG_NO_RESULTS).await?;
        return Ok(());
    }

    let mut candidates = tmdb::eligible_candidates(&raw);
    match candidates.len() {
        0 => {
            bot.send_message(chat, MSG_NO_ELIGIBLE).await?;
        }
        // A lone hit is rendered from the search record itself.
        1 => render_media(bot, chat, &candidates.remove(0).into()).await?,
        _ => {
            bot.send_message(chat, MSG_PICK_ONE)
                .reply_markup(keyboard_choices(&candidates))
                .await?;
        }
    }
    Ok(())
}

async fn handle_callback(
    bot: &Bot,
    q: &CallbackQuery,
    config: &Config,
    tmdb: &TmdbClient,
) -> anyhow::Result<()> {
    bot.answer_callback_query(q.id.clone()).await?;
    let Some(chat) = q.message.as_ref().map(|m| m.chat().id) else {
        return Ok(());
    };
    if !check_access(bot, chat, Some(q.from.id.0), config).await? {
        return Ok(());
    }
    let Some(token) = q.data.as_deref().and_then(SelectionToken::parse) else {
        tracing::warn!(data = ?q.data, "unparseable callback payload");
        return Ok(());
    };

    // Selections always re-fetch the full record; the search row is abbreviated.
    match tmdb.get_detail(token.kind, token.id).await {
        Ok(detail) => render_media(bot, chat, &detail).await?,
        Err(err) => {
            tracing::error!(error = %err, kind = %token.kind, id = token.id, "tmdb detail fetch failed");
            bot.send_message(chat, MSG_DETAIL_ERROR).await?;
        }
    }
    Ok(())
}

/* ====== Access guard ====== */

async fn check_access(
    bot: &Bot,
    chat: ChatId,
    user_id: Option<u64>,
    config: &Config,
) -> anyhow::Result<bool> {
    match user_id {
        Some(id) if config.is_authorized(id) => Ok(true),
        Some(id) => {
            tracing::warn!(user_id = id, "denied access");
            bot.send_message(chat, MSG_UNAUTHORIZED).await?;
            Ok(false)
        }
        // Channel posts and the like carry no sender; nothing to do.
        None => Ok(false),
    }
}

fn message_user_id(msg: &Message) -> Option<u64> {
    msg.from.as_ref().map(|u| u.id.0)
}

/* ====== Poster rendering ====== */

/// Sends exactly one outbound message: the poster with a caption, or a
/// text-only rendition when there is no poster or delivery fails.
async fn render_media(bot: &Bot, chat: ChatId, media: &MediaDetail) -> anyhow::Result<()> {
    let caption = caption(media);
    let Some(path) = media.poster_path.as_deref() else {
        bot.send_message(chat, format!("{caption}\n\n{NOTE_NO_POSTER}"))
            .parse_mode(ParseMode::Markdown)
            .await?;
        return Ok(());
    };

    let attempt = match reqwest::Url::parse(&format!("{}{}", tmdb::TMDB_IMAGE_BASE_URL, path)) {
        Ok(url) => bot
            .send_photo(chat, InputFile::url(url))
            .caption(caption.clone())
            .parse_mode(ParseMode::Markdown)
            .await
            .map(drop)
            .map_err(anyhow::Error::from),
        Err(err) => Err(err.into()),
    };
    if let Err(err) = attempt {
        tracing::error!(error = %err, poster = path, "poster delivery failed");
        bot.send_message(chat, format!("{caption}\n\n{NOTE_POSTER_FAILED}"))
            .parse_mode(ParseMode::Markdown)
            .await?;
    }
    Ok(())
}

fn caption(media: &MediaDetail) -> String {
    let title = media
        .title
        .as_deref()
        .or(media.name.as_deref())
        .unwrap_or("Unknown");
    let year = media
        .release_date
        .as_deref()
        .or(media.first_air_date.as_deref())
        .map(tmdb::four_char_year)
        .unwrap_or("N/A");
    let overview = media.overview.as_deref().unwrap_or(MSG_NO_OVERVIEW);
    truncate_chars(&format!("**{title} ({year})**\n{overview}"), CAPTION_LIMIT)
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/* ====== Disambiguation keyboard ====== */

fn keyboard_choices(candidates: &[SearchEntry]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = candidates
        .iter()
        .filter_map(|c| {
            let token = SelectionToken { kind: c.kind()?, id: c.id };
            Some(vec![InlineKeyboardButton::callback(
                format!("{} ({})", c.display_title(), c.display_year()),
                token.encode(),
            )])
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

/// Stateless disambiguation token carried in callback button payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SelectionToken {
    kind: MediaKind,
    id: u64,
}

impl SelectionToken {
    fn encode(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }

    fn parse(data: &str) -> Option<Self> {
        let (kind, id) = data.split_once(':')?;
        Some(Self {
            kind: kind.parse().ok()?,
            id: id.parse().ok()?,
        })
    }
}

/* ====== Last-resort error reporting ====== */

async fn report_unhandled(bot: &Bot, chat: Option<ChatId>, context: &str, err: &anyhow::Error) {
    tracing::error!(error = ?err, context, "unhandled failure in update handler");
    if let Some(chat) = chat {
        if let Err(send_err) = bot.send_message(chat, MSG_UNEXPECTED).await {
            tracing::error!(error = %send_err, "failed to deliver the error notice");
        }
    }
}
