//! `history` subcommands over the saved chats.

use std::error::Error;

use crate::core::chat_history::{ChatHistory, ChatId, HistoryError, JsonChatHistory};
use crate::core::config::data::path_display;

pub async fn list_chats(history: &JsonChatHistory) -> Result<(), Box<dyn Error>> {
    let chats = history.list_chats().await?;
    println!("Saved chats (from {}):\n", path_display(history.dir()));
    if chats.is_empty() {
        println!("  No saved chats yet.");
        return Ok(());
    }
    for chat in chats {
        println!(
            "  • {}  {}  ({} messages, updated {})",
            chat.id,
            chat.title,
            chat.message_count,
            chat.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!("\n💡 Resume a chat with:");
    println!("   mediscan-chat chat --chat <id>");
    Ok(())
}

pub async fn show_chat(history: &JsonChatHistory, id: &str) -> Result<(), Box<dyn Error>> {
    let session = history.get_chat(&ChatId::new(id)).await?;
    println!("{}", session.title);
    println!("created {}\n", session.created_at.format("%Y-%m-%d %H:%M"));
    for message in &session.messages {
        let speaker = if message.role.is_user() { "You" } else { "MediScan" };
        println!("{speaker}: {}", message.content);
        if let Some(url) = &message.image_url {
            println!("  [image: {url}]");
        }
        println!();
    }
    Ok(())
}

pub async fn delete_chat(history: &JsonChatHistory, id: &str) -> Result<(), Box<dyn Error>> {
    match history.delete_chat(&ChatId::new(id)).await {
        Ok(()) => {
            println!("✅ Deleted chat {id}");
            Ok(())
        }
        Err(HistoryError::NotFound(id)) => {
            eprintln!("❌ No saved chat with id {id}");
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}
