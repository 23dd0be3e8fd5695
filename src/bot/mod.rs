//! Conversation layer: commands, keyboards, per-user state and the handlers
//! that tie them to the store.

mod commands;
mod handlers;
mod keyboard;
mod state;
mod telegram;


pub use commands::{Command, from_button};
pub use handlers::{APOLOGY, App, Clock, Document, NumberTooLarge, Outcome, Reply, confirm_choice, parse_ints_from_text};
pub use keyboard::{CANCEL_BUTTON, CONFIRM_PREFIX, Keyboard};
pub use state::{IdPurpose, NumbersPurpose, State};
pub use telegram::{TelegramClient, handle_callback, handle_message};
