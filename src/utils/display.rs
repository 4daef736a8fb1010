use crate::core::{Message, Role};
use colored::*;

/// Banner naming the session being shown
pub fn print_session_header(user_id: &str, session_id: &str, count: usize) {
    let title = format!("{} / {}", user_id, session_id);
    println!("\n{} {}", title.bright_cyan().bold(), format!("({} messages)", count).dimmed());
    println!("{}", "-".repeat(title.len()).bright_cyan());
}

pub fn print_success(text: &str) {
    println!("{} {}", "ok".green().bold(), text);
}

pub fn print_error(text: &str) {
    eprintln!("{} {}", "error:".red().bold(), text);
}

pub fn print_info(text: &str) {
    println!("{}", text.dimmed());
}

pub fn print_message(index: usize, message: &Message) {
    let label = match &message.name {
        Some(name) => format!("{} ({})", message.role, name),
        None => message.role.to_string(),
    };
    let label = match message.role {
        Role::Human => label.yellow().bold(),
        Role::Ai => label.green().bold(),
        Role::System => label.magenta().bold(),
        _ => label.white().bold(),
    };
    println!("{:>3}. {}: {}", index + 1, label, message.content);
}
