//! Telegram transport: inbound dispatch and outbound delivery.
//!
//! The transport does field mapping only — no business logic. Every update
//! becomes an [`InboundMessage`] for the router; the router's reply is
//! stripped of markup and sent back, with a contact-request keyboard
//! attached when the application asked for one.

use std::sync::Arc;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::router::{AgenticMessageRouter, ChatMap, ContactPayload, InboundMessage};
use crate::tools::communication::Broadcast;
use crate::types::ChatType;

pub mod ui;

/// Shared dependencies injected into teloxide handlers via `dptree::deps!`.
#[derive(Clone)]
struct SharedState {
    router: Arc<AgenticMessageRouter>,
}

/// Run the Telegram transport.
///
/// Starts two concurrent tasks: the inbound dispatcher feeding the router,
/// and the outbound sender draining the broadcast queue into the team
/// chats. Blocks until the bot is stopped (Ctrl+C).
pub async fn run_telegram(
    bot_token: &str,
    router: Arc<AgenticMessageRouter>,
    chat_map: ChatMap,
    mut broadcasts: mpsc::Receiver<Broadcast>,
) -> anyhow::Result<()> {
    let bot = Bot::new(bot_token);

    // Outbound broadcast sender.
    let outbound_bot = bot.clone();
    let _outbound_handle = tokio::spawn(async move {
        while let Some(broadcast) = broadcasts.recv().await {
            let chat_id = match broadcast.chat {
                ChatType::Main => chat_map.main_chat_id.clone(),
                ChatType::Leadership => chat_map.leadership_chat_id.clone(),
                other => {
                    warn!(chat = %other, "broadcast to unsupported chat type dropped");
                    continue;
                }
            };
            let Ok(raw_id) = chat_id.parse::<i64>() else {
                warn!(chat_id = %chat_id, "broadcast chat id is not numeric, dropped");
                continue;
            };
            let text = ui::strip_markup(&broadcast.text);
            if let Err(e) = outbound_bot.send_message(ChatId(raw_id), text).await {
                warn!(error = %e, "failed to deliver broadcast");
            }
        }
    });

    let shared = SharedState { router };

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    info!("telegram dispatcher starting");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![shared])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Handle one incoming Telegram message: map fields, route, reply.
async fn handle_message(bot: Bot, msg: Message, state: SharedState) -> ResponseResult<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let telegram_id = i64::try_from(user.id.0).unwrap_or(0);
    debug!(telegram_id, "telegram message received");

    let contact = msg.contact().map(|c| ContactPayload {
        phone: c.phone_number.clone(),
        user_id: c.user_id.and_then(|id| i64::try_from(id.0).ok()),
    });

    let inbound = InboundMessage {
        telegram_id,
        username: user.username.clone().unwrap_or_default(),
        display_name: user.full_name(),
        chat_id: msg.chat.id.to_string(),
        text: msg.text().map(str::to_owned),
        contact,
    };

    let reply = state.router.process(inbound).await;
    let text = ui::strip_markup(&reply.text);

    let request = bot.send_message(msg.chat.id, text);
    if reply.needs_contact_button {
        request.reply_markup(ui::contact_keyboard()).await?;
    } else {
        request.await?;
    }
    Ok(())
}
