//! Everything the bot says, rendered as Telegram HTML.

use chrono::FixedOffset;
use itertools::Itertools;

use crate::{
    errors::AppError,
    models::{
        game::{Game, JoinOutcome, LeaveOutcome},
        player::{Player, points_to_ntrp},
        wizard::{GameStep, SurveyStep},
    },
    payloads::Action,
    repositories::signup_repo::DbSignupPlayer,
    responses::{InlineButton, InlineKeyboard},
    services::survey_service,
};

pub const TRY_AGAIN_LATER: &str = "Something went wrong on our side. Please try again later.";
pub const ADMIN_ONLY: &str = "This command is only available to administrators.";
pub const PONG: &str = "pong";
pub const NO_ACTIVE_GAMES: &str = "There are no upcoming games.";
pub const NOTHING_TO_CANCEL: &str = "There is nothing to cancel.";
pub const WIZARD_CANCELLED: &str = "Cancelled. Nothing was saved from this dialogue.";
pub const PHOTO_SAVED: &str = "Photo saved. Keep filling in the fields.";
pub const UNKNOWN_INPUT: &str = "I did not understand that. Send /help for the list of commands.";
pub const CANCEL_GAME_FORBIDDEN: &str =
    "Only the creator of the game or an administrator can cancel it.";
pub const CANCEL_GAME_USAGE: &str = "Usage: /cancelgame &lt;game id&gt;";
pub const NO_PLAYERS: &str = "No players have registered yet.";
pub const BROADCAST_NOT_CONFIGURED: &str =
    "The game was saved but not announced: BROADCAST_CHAT_ID is not configured. Set it and restart the bot.";
pub const ONBOARDING_REQUIRED_ALERT: &str =
    "Check your private messages: I sent you a link to finish your profile.";
pub const OPEN_BOT_ALERT: &str = "Open a chat with the bot and press /start to finish your profile.";
pub const JOIN_AFTER_ONBOARDING: &str =
    "To sign up for the game, open the bot and finish your profile.";

/// Telegram rejects alerts above 200 characters.
const ALERT_LIMIT: usize = 190;

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

pub fn deep_link(bot_username: &str, game_id: i64) -> String {
    format!("https://t.me/{}?start=join_{}", bot_username, game_id)
}

pub fn game_short(game: &Game, joined: i64, offset: &FixedOffset) -> String {
    let mut lines = vec![format!(
        "🗓 {}",
        game.local_start(offset).format("%d.%m %H:%M")
    )];
    if let Some(location) = &game.location {
        lines.push(format!("📍 {}", escape_html(location)));
    }
    if let Some(level) = &game.level_hint {
        lines.push(format!("🎚 {}", escape_html(level)));
    }
    match game.max_players {
        Some(max) => lines.push(format!("👥 {}/{}", joined, max)),
        None => lines.push(format!("👥 {}", joined)),
    }
    lines.join("\n")
}

pub fn game_full(game: &Game, joined: i64, offset: &FixedOffset) -> String {
    let title = game
        .title
        .as_ref()
        .map(|t| format!("🎾 <b>{}</b>\n", escape_html(t)))
        .unwrap_or_default();
    let description = game
        .description
        .as_ref()
        .map(|d| format!("\n\n{}", escape_html(d)))
        .unwrap_or_default();
    format!("{}{}{}", title, game_short(game, joined, offset), description)
}

/// The text of the broadcast post.
pub fn game_announcement(game: &Game, joined: i64, offset: &FixedOffset) -> String {
    let full = game_full(game, joined, offset);
    if game.is_cancelled {
        format!("❌ <b>Cancelled</b>\n\n{}", full)
    } else {
        full
    }
}

pub fn game_list_entry(game: &Game, joined: i64, offset: &FixedOffset) -> String {
    format!("{}\n\nGame ID: {}", game_full(game, joined, offset), game.id)
}

pub fn game_keyboard(game_id: i64) -> InlineKeyboard {
    InlineKeyboard::row(vec![
        InlineButton::action("✅ Join", Action::JoinGame(game_id)),
        InlineButton::action("👥 Players", Action::ListPlayers(game_id)),
        InlineButton::action("🚫 Leave", Action::LeaveGame(game_id)),
    ])
}

/// Plain text for a callback alert, which is not HTML formatted.
pub fn signup_alert(players: &[DbSignupPlayer]) -> String {
    if players.is_empty() {
        return "Nobody has signed up yet".to_string();
    }
    let text = players
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let name = match &p.last_name {
                Some(last) => format!("{} {}", p.first_name, last),
                None => p.first_name.clone(),
            };
            let handle = p
                .username
                .as_ref()
                .map(|u| format!(" (@{})", u))
                .unwrap_or_default();
            format!("{}. {}{}", i + 1, name.trim(), handle)
        })
        .join("\n");
    truncate_chars(&text, ALERT_LIMIT)
}

pub fn join_reply(outcome: JoinOutcome) -> String {
    match outcome {
        JoinOutcome::Joined => "You are signed up".to_string(),
        JoinOutcome::Rejected(reason) => reason.to_string(),
    }
}

pub fn leave_reply(outcome: LeaveOutcome) -> &'static str {
    match outcome {
        LeaveOutcome::Left => "Your signup is cancelled",
        LeaveOutcome::NotJoined => "You were not signed up",
    }
}

/// Reported after a join that was waiting for onboarding is retried.
pub fn resumed_join(game_id: i64, outcome: JoinOutcome) -> String {
    match outcome {
        JoinOutcome::Joined => format!("✅ You are signed up for game #{}.", game_id),
        JoinOutcome::Rejected(reason) => {
            format!("Could not sign you up for game #{}: {}.", game_id, reason)
        }
    }
}

fn survey_keyboard(step: SurveyStep) -> Option<InlineKeyboard> {
    let question = survey_service::question(step);
    if question.options.is_empty() {
        return None;
    }
    let buttons = question
        .options
        .iter()
        .enumerate()
        .map(|(index, label)| InlineButton::action(*label, Action::SurveyAnswer { step, index }))
        .collect();
    Some(InlineKeyboard::column(buttons))
}

pub fn survey_prompt(step: SurveyStep) -> (String, Option<InlineKeyboard>) {
    let question = survey_service::question(step);
    let text = format!(
        "Step {}/{}\n\n{}",
        step.number(),
        SurveyStep::ALL.len(),
        question.prompt
    );
    (text, survey_keyboard(step))
}

/// First message for a player who has not finished onboarding: the opening
/// survey question plus the manual NTRP shortcut.
pub fn welcome(first_name: &str, community_url: Option<&str>) -> (String, InlineKeyboard) {
    let (question, keyboard) = survey_prompt(SurveyStep::Level);
    let text = format!(
        "🎾 Welcome to CourtMate, {}!\n\nLet's set up your profile so we can match you with partners.\n\n{}",
        escape_html(first_name),
        question
    );
    let mut keyboard = keyboard.unwrap_or_default();
    keyboard.inline_keyboard.push(vec![InlineButton::action(
        "📊 I know my NTRP rating",
        Action::ManualRating,
    )]);
    if let Some(url) = community_url {
        keyboard
            .inline_keyboard
            .push(vec![InlineButton::link("💬 Community", url.to_string())]);
    }
    (text, keyboard)
}

pub fn main_menu(player: &Player, community_url: Option<&str>) -> (String, Option<InlineKeyboard>) {
    let text = format!(
        "🎾 Welcome back, {}!\n\n/games - upcoming games\n/profile - your profile\n/help - all commands",
        escape_html(&player.first_name)
    );
    let keyboard = community_url.map(|url| {
        InlineKeyboard::row(vec![InlineButton::link("💬 Community", url.to_string())])
    });
    (text, keyboard)
}

pub fn manual_rating_prompt() -> String {
    [
        "📊 Send your NTRP rating",
        "",
        "It must be between 1.0 and 7.0 in steps of 0.5, for example 2.5, 3.0 or 4.5.",
        "",
        "1.0 - just starting to play",
        "2.5 - needs more match experience",
        "3.5 - good directional control",
        "4.5 - uses power and spin",
        "5.5 - powerful strokes and consistency",
    ]
    .join("\n")
}

pub fn retry(error: &AppError) -> String {
    format!("⚠️ {}", escape_html(&error.to_string()))
}

pub fn profile(player: &Player) -> String {
    let handle = player
        .username
        .as_ref()
        .map(|u| format!(" (@{})", escape_html(u)))
        .unwrap_or_default();
    let rating = if player.rating_confirmed {
        format!("{} (NTRP ≈ {:.1})", player.rating, points_to_ntrp(player.rating))
    } else {
        "not set".to_string()
    };
    let courts = if player.court_types.is_empty() {
        "not set".to_string()
    } else {
        player.court_types.iter().join(", ")
    };
    let availability = if player.availability.is_empty() {
        "not set".to_string()
    } else {
        escape_html(&player.availability.join(", "))
    };
    format!(
        "👤 <b>{}</b>{}\n\n🎯 Level: {}\n📚 Experience: {} years\n🏆 Rating: {}\n🏟️ Courts: {}\n📍 District: {}\n⏰ Availability: {}",
        escape_html(&player.display_name()),
        handle,
        player.skill_level,
        player.experience_years,
        rating,
        courts,
        player
            .district
            .as_deref()
            .map(escape_html)
            .unwrap_or_else(|| "not set".to_string()),
        availability
    )
}

pub fn survey_completed(player: &Player) -> String {
    format!(
        "✅ Your profile is ready!\n\n{}\n\nSend /games to see upcoming games or /help for all commands.",
        profile(player)
    )
}

pub fn help(is_admin: bool) -> String {
    let mut lines = vec![
        "<b>Commands</b>",
        "/start - register or open the main menu",
        "/profile - show your profile",
        "/ntrp - set your NTRP rating manually",
        "/games - upcoming games",
        "/cancel - stop the current dialogue",
        "/ping - check that the bot is alive",
        "/help - this message",
    ];
    if is_admin {
        lines.extend([
            "",
            "<b>Admin</b>",
            "/newgame - create and announce a game",
            "/players - players grouped by district",
            "/cancelgame &lt;id&gt; - cancel a game",
        ]);
    }
    lines.join("\n")
}

pub fn players_by_district(groups: &[(Option<String>, Vec<Player>)]) -> String {
    if groups.is_empty() {
        return NO_PLAYERS.to_string();
    }
    groups
        .iter()
        .map(|(district, players)| {
            let header = match district {
                Some(d) => format!("📍 <b>{}</b>", escape_html(d)),
                None => "📍 <b>No district</b>".to_string(),
            };
            let rows = players.iter().map(|p| {
                let handle = p
                    .username
                    .as_ref()
                    .map(|u| format!(" @{}", escape_html(u)))
                    .unwrap_or_default();
                format!(
                    "• {}{} - {}",
                    escape_html(&p.display_name()),
                    handle,
                    p.rating
                )
            });
            std::iter::once(header).chain(rows).join("\n")
        })
        .join("\n\n")
}

pub fn game_wizard_prompt(step: GameStep) -> String {
    let prompt = match step {
        GameStep::DateTime => "Enter the date and time, for example 25.12 19:30",
        GameStep::Location => "Enter the location (courts or address) or '-' to skip",
        GameStep::Capacity => "Player limit (a number) or '-' for no limit",
        GameStep::LevelHint => "Level or NTRP (for example NTRP 2.5-3.0) or '-' to skip",
        GameStep::Title => "Post title or '-' to skip",
        GameStep::Description => {
            "Description or comment, or '-' to skip. You can send a photo for the post at any step."
        }
    };
    format!("Step {}/{}: {}", step.number(), GameStep::COUNT, prompt)
}

/// Lets the user abandon a running dialogue without typing /cancel.
pub fn cancel_keyboard() -> InlineKeyboard {
    InlineKeyboard::row(vec![InlineButton::action("✖️ Cancel", Action::CancelWizard)])
}

pub fn game_published(game_id: i64) -> String {
    format!("Game published. ID: {}", game_id)
}

pub fn game_cancelled(game_id: i64) -> String {
    format!("Game #{} is cancelled.", game_id)
}

pub fn game_already_cancelled(game_id: i64) -> String {
    format!("Game #{} was already cancelled.", game_id)
}
