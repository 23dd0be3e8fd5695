use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup,
};

/// Keyboard attached to a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    Main,
    Cancel,
    Remove,
    Confirm,
}

pub const CANCEL_BUTTON: &str = "❌ Отмена";

const MAIN_ROWS: &[&[&str]] = &[
    &["/about", "/sum", "/max"],
    &["/help", "/confirm", "/weather"],
    &["/ping", "/hide", "/show"],
    &["➕ Добавить еду", "📊 Сегодня", "📈 Неделя"],
    &["📅 Месяц", "📊 График", "📋 Дневник"],
    &["/note_add", "/note_list", "/note_find"],
    &["/note_edit", "/note_del", "/note_count"],
    &["/note_export", "/stats"],
    &["/models", "/model", "/ask"],
];

const CONFIRM_ROWS: &[&[(&str, &str)]] = &[
    &[("✅ Да", "yes"), ("❌ Нет", "no"), ("🤔 Возможно", "maybe")],
    &[("🔄 Повторить позже", "later"), ("🚫 Отмена", "cancel")],
];

pub const CONFIRM_PREFIX: &str = "confirm:";

impl Keyboard {
    pub fn markup(self) -> ReplyMarkup {
        match self {
            Keyboard::Main => reply_keyboard(MAIN_ROWS),
            Keyboard::Cancel => reply_keyboard(&[&[CANCEL_BUTTON]]),
            Keyboard::Remove => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
            Keyboard::Confirm => ReplyMarkup::InlineKeyboard(confirm_keyboard()),
        }
    }
}

fn reply_keyboard(rows: &[&[&str]]) -> ReplyMarkup {
    let rows = rows
        .iter()
        .map(|row| row.iter().map(|label| KeyboardButton::new(*label)).collect::<Vec<_>>());
    ReplyMarkup::Keyboard(KeyboardMarkup::new(rows).resize_keyboard())
}

fn confirm_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(CONFIRM_ROWS.iter().map(|row| {
        row.iter()
            .map(|(label, choice)| InlineKeyboardButton::callback(*label, format!("{CONFIRM_PREFIX}{choice}")))
            .collect::<Vec<_>>()
    }))
}
