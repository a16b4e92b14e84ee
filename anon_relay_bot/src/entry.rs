use std::sync::Arc;
use teloxide::{dptree::deps, prelude::*, types::BotCommand};

use crate::{
    config::Config,
    controller::ModerationController,
    database::Database,
    handlers::{handle_callback_query, handle_message, Controller},
};

/// # Panics
///
/// Panics if the configuration is incomplete, Telegram can't be reached or the database can't
/// be opened.
pub async fn entry() {
    let config = Config::from_env().expect("Failed to load configuration!");

    let bot = Bot::new(&config.bot_token);

    let me = bot
        .get_me()
        .await
        .expect("Failed to get info about the bot itself!");

    let config = Arc::new(
        config
            .with_bot_username(me.username())
            .expect("Failed to make the call-to-action link!"),
    );

    bot.set_my_commands(vec![BotCommand::new(
        "start",
        "How to send an anonymous message",
    )])
    .await
    .expect("Failed to set bot commands!");

    let database = Arc::new(
        Database::new(&config.database_url)
            .await
            .expect("Failed to open the database!"),
    );

    log::info!("Running as @{}", me.username());
    log::info!("Admins: {:?}", config.admin_chat_ids);
    log::info!("Channel: {}", config.channel_id);

    let controller: Arc<Controller> = Arc::new(ModerationController::new(
        database.clone(),
        bot.clone(),
        config,
    ));

    log::info!("Creating the handler...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback_query));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![controller])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    database.close().await;

    log::info!("it appears we have been bonked.");
}
