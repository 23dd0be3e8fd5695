//! Chat logic: a message plus the user's pending state in, replies plus the
//! next state out. Nothing here talks to Telegram directly.

use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

use super::commands::{self, Command};
use super::keyboard::{CONFIRM_PREFIX, Keyboard};
use super::state::{IdPurpose, NumbersPurpose, State};
use crate::estimator::Estimator;
use crate::format::{self, html_escape};
use crate::openrouter::{self, Message, Sampling};
use crate::store::{
    Database, ENTRY_CAPACITY, EntryKind, Granularity, LlmModel, NewEntry, PeriodTotals, Result, StoreError, TIMESTAMP_FORMAT, User,
};
use crate::weather::WeatherClient;

const NOTE_LIST_LIMIT: usize = 10;
const DIARY_STATS_LIMIT: usize = 50;
const WEEK_DAYS: i64 = 7;
const MONTH_DAYS: i64 = 30;

const ASSISTANT_PROMPT: &str = "Ты полезный ассистент. Отвечай кратко и по делу.";
const ASK_SAMPLING: Sampling = Sampling { temperature: 0.2, max_tokens: 400 };
const QUESTION_MAX_CHARS: usize = 1000;
const ANSWER_MAX_CHARS: usize = 4000;

const HELP_TEXT: &str = "📋 <b>Основные команды:</b>
/start - начать работу
/help - эта справка
/about - о боте
/ping - проверка работы бота
/cancel - отменить текущее действие

🧮 <b>Математика:</b>
/sum - сложить числа
/max - найти максимум

🌤️ <b>Погода:</b>
/weather - текущая погода

🔄 <b>Управление:</b>
/confirm - подтверждение действия
/hide - скрыть клавиатуру
/show - показать клавиатуру

📝 <b>Система заметок:</b>
/note_add - добавить заметку
/note_list - список заметок
/note_find - поиск заметок
/note_edit - редактировать заметку
/note_del - удалить заметку
/note_count - количество заметок
/note_export - экспорт в файл
/stats - статистика

🍎 <b>Дневник питания:</b>
/add [еда] - записать прием пищи
/today - статистика за сегодня
/week - статистика за неделю
/month - статистика за месяц
/chart - график калорий
/diary - общая статистика
/food_del [ID] - удалить запись

🤖 <b>OpenRouter AI:</b>
/models - список моделей AI
/model &lt;id&gt; - выбрать активную модель
/ask &lt;вопрос&gt; - задать вопрос активной модели
/ask_model &lt;id&gt; &lt;вопрос&gt; - задать вопрос конкретной модели
Пример: /ask_model 3 Какая сегодня погода?";

const ABOUT_TEXT: &str = "Это бот с системой заметок, дневником питания и полезными командами, \
созданный с целью приобретения первых практических навыков в создании телеграм-ботов!";

const FOOD_PROMPT: &str = "🍽 <b>Что вы съели?</b>

📝 <b>Примеры:</b>
• овсянка 100г на молоке
• куриная грудка с гречкой
• яблоко и творог 200г

Просто напишите что вы съели и нажмите отправить!
Используйте <b>❌ Отмена</b> чтобы вернуться в меню.";

const FOOD_MORE: &str = "✅ <b>Готово!</b>

Хотите добавить еще один прием пищи?
Напишите что съели или нажмите <b>❌ Отмена</b> чтобы вернуться в меню.";

const NOT_UNDERSTOOD: &str = "🤔 <b>Я вас не понял</b>

Используйте кнопки ниже или команды:
• <b>➕ Добавить еду</b> - записать прием пищи
• <b>📊 Сегодня</b> - статистика за день
• <b>🆘 Помощь</b> - справка

Или напишите /help для справки.";

const UNKNOWN_COMMAND: &str = "❓ Неизвестная команда. Напишите /help для списка команд.";

pub const APOLOGY: &str = "⚠️ <b>Произошла ошибка</b>

Попробуйте выполнить действие еще раз или используйте команду /start для перезагрузки.";

/// Source of the current instant; swapped out in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A file sent instead of a text message; the reply text becomes its caption.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub file_name: String,
    pub contents: String,
}

/// One outgoing message. `text` is HTML.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
    /// Send as a reply to the triggering message.
    pub quote: bool,
    pub document: Option<Document>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), keyboard: None, quote: false, document: None }
    }

    pub fn keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn quoted(mut self) -> Self {
        self.quote = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub replies: Vec<Reply>,
    pub next: State,
}

impl Outcome {
    fn idle(replies: Vec<Reply>) -> Self {
        Self { replies, next: State::Idle }
    }

    fn to(next: State, replies: Vec<Reply>) -> Self {
        Self { replies, next }
    }

    /// Generic answer for failures that are not the user's fault.
    pub fn apology() -> Self {
        Self::idle(vec![Reply::text(APOLOGY).keyboard(Keyboard::Main)])
    }
}

/// An integer token outside the `i128` range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberTooLarge(pub String);

/// Integers in free text. Commas separate like spaces; `/command` tokens and
/// anything non-numeric are skipped.
pub fn parse_ints_from_text(text: &str) -> std::result::Result<Vec<i128>, NumberTooLarge> {
    text.replace(',', " ")
        .split_whitespace()
        .filter(|token| !token.starts_with('/') && is_integer(token))
        .map(|token| token.parse().map_err(|_| NumberTooLarge(token.to_string())))
        .collect()
}

fn is_integer(token: &str) -> bool {
    let digits = token.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

enum Computed {
    Answer(String),
    NoNumbers,
    /// User-facing explanation of the overflow.
    TooLarge(String),
}

fn compute(purpose: NumbersPurpose, text: &str) -> Computed {
    let numbers = match parse_ints_from_text(text) {
        Ok(numbers) if numbers.is_empty() => return Computed::NoNumbers,
        Ok(numbers) => numbers,
        Err(NumberTooLarge(token)) => {
            return Computed::TooLarge(format!(
                "❌ Слишком большое число: {}",
                html_escape(&format::truncate_chars(&token, 40))
            ));
        }
    };
    match purpose {
        NumbersPurpose::Sum => match numbers.iter().try_fold(0i128, |acc, &n| acc.checked_add(n)) {
            Some(sum) => Computed::Answer(format!("Сумма: {sum}")),
            None => Computed::TooLarge("❌ Сумма слишком велика для вычисления.".to_string()),
        },
        NumbersPurpose::Max => match numbers.iter().max() {
            Some(max) => Computed::Answer(format!("Максимум: {max}")),
            None => Computed::NoNumbers,
        },
    }
}

/// Reply text for a pressed `/confirm` button, `None` for foreign callbacks.
pub fn confirm_choice(data: &str) -> Option<&'static str> {
    let choice = data.strip_prefix(CONFIRM_PREFIX)?;
    Some(match choice {
        "yes" => "✅ Действие подтверждено!",
        "no" => "❌ Действие отклонено!",
        "maybe" => "🤔 Выбрано \"Возможно\". Решите позже.",
        "later" => "🔄 Отложено. Напомнить через час.",
        "cancel" => "🚫 Действие отменено.",
        _ => "Неизвестный выбор",
    })
}

/// Everything the handlers need, passed explicitly.
pub struct App {
    db: Database,
    estimator: Estimator,
    weather: WeatherClient,
    llm: Option<openrouter::Client>,
    tz: Tz,
    bot_name: String,
    clock: Clock,
}

impl App {
    pub fn new(
        db: Database,
        estimator: Estimator,
        weather: WeatherClient,
        llm: Option<openrouter::Client>,
        tz: Tz,
        bot_name: impl Into<String>,
    ) -> Self {
        Self {
            db,
            estimator,
            weather,
            llm,
            tz,
            bot_name: bot_name.into(),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Wall-clock time in the diary timezone.
    fn now_local(&self) -> NaiveDateTime {
        (self.clock)().with_timezone(&self.tz).naive_local()
    }

    /// Handle one text message and persist the resulting state.
    pub async fn handle_message(&self, user: &User, text: &str) -> Result<Outcome> {
        let now = self.now_local();
        self.db.upsert_user(user, &now.format(TIMESTAMP_FORMAT).to_string())?;
        let state: State = self.db.load_state(user.id)?;
        let text = text.trim();

        let outcome = if text.starts_with('/') {
            match Command::parse(text, &self.bot_name) {
                Ok(command) => {
                    info!("📨 {:?} from {} ({})", command, user.display_name, user.id);
                    self.handle_command(user, command, state).await?
                }
                Err(e) => {
                    debug!("Unparsed command {text:?}: {e}");
                    Outcome::idle(vec![Reply::text(UNKNOWN_COMMAND).keyboard(Keyboard::Main)])
                }
            }
        } else if let Some(command) = commands::from_button(text) {
            self.handle_command(user, command, state).await?
        } else {
            self.handle_text(user, text, state).await?
        };

        if outcome.next != state {
            debug!("State of {}: {:?} -> {:?}", user.id, state, outcome.next);
        }
        self.db.save_state(user.id, &outcome.next)?;
        Ok(outcome)
    }

    async fn handle_command(&self, user: &User, command: Command, state: State) -> Result<Outcome> {
        let main = |text: &str| Outcome::idle(vec![Reply::text(text).keyboard(Keyboard::Main)]);

        Ok(match command {
            Command::Start => main(&format!(
                "Привет, {}! Я бот с заметками, дневником питания и полезными командами! Напиши /help",
                html_escape(&user.display_name)
            )),
            Command::Help => main(HELP_TEXT),
            Command::About => main(ABOUT_TEXT),
            Command::Ping => Outcome::idle(vec![Reply::text("Pong! Бот работает исправно! ✅").quoted()]),
            Command::Hide => Outcome::idle(vec![
                Reply::text("Клавиатура скрыта. Используйте /show чтобы вернуть её.").keyboard(Keyboard::Remove),
            ]),
            Command::Show => main("Клавиатура возвращена!"),
            Command::Sum(args) => self.numbers_command(NumbersPurpose::Sum, &args),
            Command::Max(args) => self.numbers_command(NumbersPurpose::Max, &args),
            Command::Weather => main(&self.weather.report().await),
            Command::Confirm => Outcome::idle(vec![
                Reply::text("Подтвердить действие? Выберите вариант:").keyboard(Keyboard::Confirm),
            ]),
            Command::Cancel => match state {
                State::AwaitingFood => main("❌ Добавление отменено."),
                _ => main("✅ Операция отменена."),
            },

            Command::NoteAdd(text) if !text.trim().is_empty() => self.add_note(user, text.trim())?,
            Command::NoteAdd(_) => prompt(State::AwaitingNoteText, "📝 Введите текст для новой заметки:"),
            Command::NoteList => {
                let notes = self.db.list_recent(user.id, EntryKind::Note, NOTE_LIST_LIMIT)?;
                Outcome::idle(vec![Reply::text(format::note_list(&notes)).quoted()])
            }
            Command::NoteFind(query) if !query.trim().is_empty() => self.find_notes(user, query.trim())?,
            Command::NoteFind(_) => prompt(State::AwaitingSearchQuery, "🔍 Введите текст для поиска в заметках:"),
            Command::NoteEdit(arg) => match arg.trim().parse::<i64>() {
                Ok(id) => self.begin_edit(user, id)?,
                Err(_) => prompt(
                    State::AwaitingEntryId(IdPurpose::EditNote),
                    "✏️ Введите ID заметки для редактирования:",
                ),
            },
            Command::NoteDel(arg) => match arg.trim().parse::<i64>() {
                Ok(id) => self.delete_entry(user, IdPurpose::DeleteNote, id)?,
                Err(_) => prompt(
                    State::AwaitingEntryId(IdPurpose::DeleteNote),
                    "🗑️ Введите ID заметки, которую хотите удалить:",
                ),
            },
            Command::NoteCount => {
                let count = self.db.count(user.id, EntryKind::Note)?;
                Outcome::idle(vec![Reply::text(format::note_count(count)).quoted()])
            }
            Command::NoteExport => self.export_notes(user)?,
            Command::Stats => {
                let stats = self.db.note_stats(user.id, self.now_local())?;
                Outcome::idle(vec![Reply::text(format::note_stats(&stats)).quoted()])
            }

            Command::Add(text) if !text.trim().is_empty() => self.log_food(user, text.trim(), false).await?,
            Command::Add(_) => Outcome::to(
                State::AwaitingFood,
                vec![Reply::text(FOOD_PROMPT).keyboard(Keyboard::Cancel)],
            ),
            Command::Today => {
                let today = self.now_local().date();
                let totals = self.db.day_totals(user.id, today)?;
                let entries = self.db.entries_on(user.id, EntryKind::Food, today)?;
                main(&format::daily_summary(totals.as_ref(), &entries))
            }
            Command::Week => main(&format::weekly_report(&self.recent_days(user, WEEK_DAYS)?)),
            Command::Month => {
                let start = self.now_local().date() - Duration::days(MONTH_DAYS);
                let months = self.db.period_summary(user.id, start, Granularity::Month)?;
                main(&format::monthly_report(&months))
            }
            Command::Chart => main(&format::weekly_chart(&self.recent_days(user, WEEK_DAYS)?)),
            Command::Diary => {
                let entries = self.db.list_recent(user.id, EntryKind::Food, DIARY_STATS_LIMIT)?;
                main(&format::diary_stats(&entries))
            }
            Command::FoodDel(arg) => match arg.trim().parse::<i64>() {
                Ok(id) => self.delete_entry(user, IdPurpose::DeleteFood, id)?,
                Err(_) => prompt(
                    State::AwaitingEntryId(IdPurpose::DeleteFood),
                    "🗑️ Введите ID записи о еде, которую хотите удалить (ID видны в /today):",
                ),
            },

            Command::Models => {
                let models = self.db.list_models()?;
                Outcome::idle(vec![Reply::text(format::model_list(&models)).quoted()])
            }
            Command::Model(arg) => self.select_model(arg.trim())?,
            Command::Ask(question) => self.ask(question.trim()).await?,
            Command::AskModel(args) => self.ask_model(args.trim()).await?,
        })
    }

    async fn handle_text(&self, user: &User, text: &str, state: State) -> Result<Outcome> {
        Ok(match state {
            State::Idle => Outcome::idle(vec![Reply::text(NOT_UNDERSTOOD).keyboard(Keyboard::Main)]),

            State::AwaitingNumbers(purpose) => match compute(purpose, text) {
                Computed::Answer(answer) => Outcome::idle(vec![
                    Reply::text(answer).quoted(),
                    Reply::text("Что еще хотите сделать?").keyboard(Keyboard::Main),
                ]),
                Computed::NoNumbers => retry_numbers(purpose, "Не вижу чисел. Пример: 2 3 10".to_string()),
                Computed::TooLarge(reason) => {
                    debug!("Numbers from {} out of range", user.id);
                    retry_numbers(purpose, reason)
                }
            },

            State::AwaitingNoteText if text.is_empty() => {
                prompt(state, "❌ Текст не может быть пустым. Введите текст заметки:")
            }
            State::AwaitingNoteText => self.add_note(user, text)?,

            State::AwaitingEntryId(purpose) => match text.parse::<i64>() {
                Err(_) => prompt(state, "❌ ID должен быть числом. Попробуйте еще раз:"),
                Ok(id) if purpose == IdPurpose::EditNote => self.begin_edit(user, id)?,
                Ok(id) => self.delete_entry(user, purpose, id)?,
            },

            State::AwaitingNoteEdit { .. } if text.is_empty() => {
                prompt(state, "❌ Текст не может быть пустым. Введите новый текст:")
            }
            State::AwaitingNoteEdit { id } => match self.db.update_text(user.id, id, text, self.now_local()) {
                Ok(()) => {
                    info!("✏️ Note #{id} of {} edited", user.id);
                    Outcome::idle(vec![Reply::text(format!("✅ Заметка #{id} успешно изменена.")).quoted()])
                }
                Err(StoreError::NotFound { .. }) => {
                    Outcome::idle(vec![Reply::text(format!("❌ Заметка #{id} не найдена.")).quoted()])
                }
                Err(e) => return Err(e),
            },

            State::AwaitingSearchQuery if text.is_empty() => {
                prompt(state, "❌ Поисковый запрос не может быть пустым. Введите текст для поиска:")
            }
            State::AwaitingSearchQuery => self.find_notes(user, text)?,

            State::AwaitingFood if text.is_empty() => prompt(state, FOOD_PROMPT),
            State::AwaitingFood => self.log_food(user, text, true).await?,
        })
    }

    fn numbers_command(&self, purpose: NumbersPurpose, args: &str) -> Outcome {
        match compute(purpose, args) {
            Computed::Answer(answer) => Outcome::idle(vec![Reply::text(answer).quoted()]),
            Computed::NoNumbers => {
                let ask = match purpose {
                    NumbersPurpose::Sum => "Введите числа через пробел или запятую:",
                    NumbersPurpose::Max => "Введите числа через пробел или запятую для поиска максимума:",
                };
                prompt(State::AwaitingNumbers(purpose), ask)
            }
            Computed::TooLarge(reason) => retry_numbers(purpose, reason),
        }
    }

    // ==================== NOTES ====================

    fn add_note(&self, user: &User, text: &str) -> Result<Outcome> {
        let entry = NewEntry::Note { text: text.to_string() };
        Ok(match self.db.add_entry(user.id, &entry, self.now_local()) {
            Ok(id) => {
                info!("📝 Note #{id} added by {}", user.id);
                Outcome::idle(vec![Reply::text(format!("✅ Заметка #{id} добавлена!")).quoted()])
            }
            Err(StoreError::CapacityExceeded { limit }) => Outcome::idle(vec![
                Reply::text(format!(
                    "❌ Достигнут лимит заметок ({limit} шт.). Удалите старые, чтобы добавить новые."
                ))
                .quoted(),
            ]),
            Err(e) => return Err(e),
        })
    }

    fn find_notes(&self, user: &User, query: &str) -> Result<Outcome> {
        let found = self.db.find(user.id, query)?;
        Ok(Outcome::idle(vec![Reply::text(format::find_results(query, &found)).quoted()]))
    }

    fn begin_edit(&self, user: &User, id: i64) -> Result<Outcome> {
        let note = self.db.get_entry(user.id, id)?.filter(|e| e.kind == EntryKind::Note);
        Ok(match note {
            Some(_) => prompt(
                State::AwaitingNoteEdit { id },
                &format!("✏️ Теперь введите новый текст для заметки #{id}:"),
            ),
            None => Outcome::idle(vec![Reply::text(format!("❌ Заметка #{id} не найдена.")).quoted()]),
        })
    }

    fn delete_entry(&self, user: &User, purpose: IdPurpose, id: i64) -> Result<Outcome> {
        let (kind, noun) = match purpose {
            IdPurpose::DeleteFood => (EntryKind::Food, "Запись"),
            IdPurpose::DeleteNote | IdPurpose::EditNote => (EntryKind::Note, "Заметка"),
        };

        // Ids of the other kind are reported like foreign ones.
        let owned = self.db.get_entry(user.id, id)?.is_some_and(|e| e.kind == kind);
        let deleted = if owned {
            match self.db.delete(user.id, id, self.now_local()) {
                Ok(_) => true,
                Err(StoreError::NotFound { .. }) => false,
                Err(e) => return Err(e),
            }
        } else {
            false
        };

        let text = if deleted {
            format!("✅ {noun} #{id} удалена.")
        } else {
            warn!("Delete of {} #{id} refused for {}", kind.as_str(), user.id);
            format!("❌ {noun} #{id} не найдена или у вас нет прав для её удаления.")
        };
        Ok(Outcome::idle(vec![Reply::text(text).quoted()]))
    }

    fn export_notes(&self, user: &User) -> Result<Outcome> {
        let notes = self.db.list_all(user.id, EntryKind::Note)?;
        if notes.is_empty() {
            return Ok(Outcome::idle(vec![Reply::text("❌ У вас нет заметок для экспорта.").quoted()]));
        }

        let now = self.now_local();
        let username = user.username.clone().unwrap_or_else(|| format!("user_{}", user.id));
        let document = Document {
            file_name: format!("notes_export_{username}_{}.txt", now.format("%Y%m%d_%H%M%S")),
            contents: format::export_document(&username, &now.format("%Y-%m-%d %H:%M").to_string(), &notes),
        };
        info!("📤 Exporting {} notes for {}", notes.len(), user.id);

        let mut reply = Reply::text(format!(
            "✅ Экспорт завершен!\nФайл содержит {} заметок.",
            notes.len()
        ));
        reply.document = Some(document);
        Ok(Outcome::idle(vec![reply]))
    }

    // ==================== FOOD ====================

    fn recent_days(&self, user: &User, days: i64) -> Result<Vec<PeriodTotals>> {
        let start = self.now_local().date() - Duration::days(days);
        self.db.period_summary(user.id, start, Granularity::Day)
    }

    async fn log_food(&self, user: &User, description: &str, keep_waiting: bool) -> Result<Outcome> {
        // A full diary never reaches the estimator.
        if self.db.count(user.id, EntryKind::Food)? >= ENTRY_CAPACITY {
            return Ok(food_capacity_reached(ENTRY_CAPACITY));
        }

        let record = self.estimator.estimate(description).await;
        let now = self.now_local();
        let entry = NewEntry::Food { description: description.to_string(), record: record.clone() };

        let id = match self.db.add_entry(user.id, &entry, now) {
            Ok(id) => id,
            Err(StoreError::CapacityExceeded { limit }) => return Ok(food_capacity_reached(limit)),
            Err(e) => return Err(e),
        };
        info!(
            "🍽 Food #{id} for {}: {} kcal ({})",
            user.id,
            record.nutrients.calories,
            record.provenance.as_str()
        );

        let summary = format!(
            "{}\n🆔 Запись #{id}",
            format::nutrition_response(description, &record, format::meal_time(now.hour()))
        );
        Ok(if keep_waiting {
            Outcome::to(
                State::AwaitingFood,
                vec![Reply::text(summary).quoted(), Reply::text(FOOD_MORE).keyboard(Keyboard::Cancel)],
            )
        } else {
            Outcome::idle(vec![Reply::text(summary).quoted().keyboard(Keyboard::Main)])
        })
    }

    // ==================== MODELS ====================

    fn select_model(&self, arg: &str) -> Result<Outcome> {
        if arg.is_empty() {
            let text = match self.db.active_model()? {
                Some(m) => format!(
                    "Текущая активная модель: {} [<code>{}</code>]\n(сменить: /model &lt;ID&gt; или /models)",
                    html_escape(&m.label),
                    html_escape(&m.key)
                ),
                None => "Список моделей пуст.".to_string(),
            };
            return Ok(Outcome::idle(vec![Reply::text(text).quoted()]));
        }

        let Ok(id) = arg.parse::<i64>() else {
            return Ok(Outcome::idle(vec![Reply::text("Использование: /model &lt;ID из /models&gt;").quoted()]));
        };

        let text = match self.db.set_active_model(id) {
            Ok(m) => format!(
                "✅ Активная модель переключена: {} [<code>{}</code>]",
                html_escape(&m.label),
                html_escape(&m.key)
            ),
            Err(StoreError::NotFound { .. }) => "❌ Неизвестный ID модели. Сначала /models.".to_string(),
            Err(e) => return Err(e),
        };
        Ok(Outcome::idle(vec![Reply::text(text).quoted()]))
    }

    async fn ask(&self, question: &str) -> Result<Outcome> {
        if question.is_empty() {
            return Ok(Outcome::idle(vec![
                Reply::text("Использование: /ask &lt;вопрос&gt;\nПример: /ask Какая сегодня погода?").quoted(),
            ]));
        }
        let Some(model) = self.db.active_model()? else {
            return Ok(Outcome::idle(vec![Reply::text("Список моделей пуст.").quoted()]));
        };

        let text = match self.complete(&model, question).await {
            Ok((answer, ms)) => format!("{answer}\n\n⏱️ {ms} мс | 🤖 {}", html_escape(&model.key)),
            Err(text) => text,
        };
        Ok(Outcome::idle(vec![Reply::text(text).quoted()]))
    }

    async fn ask_model(&self, args: &str) -> Result<Outcome> {
        let usage = "Использование: /ask_model &lt;ID&gt; &lt;вопрос&gt;\n\
                     Пример: /ask_model 3 Какая погода в Москве?\n\
                     Список моделей: /models";
        let Some((id, question)) = args.split_once(char::is_whitespace) else {
            return Ok(Outcome::idle(vec![Reply::text(usage).quoted()]));
        };
        let Ok(id) = id.parse::<i64>() else {
            return Ok(Outcome::idle(vec![
                Reply::text("❌ ID модели должен быть числом. Пример: /ask_model 3 Как дела?").quoted(),
            ]));
        };
        let question = question.trim();
        if question.is_empty() {
            return Ok(Outcome::idle(vec![
                Reply::text("❌ Вопрос не может быть пустым. Пример: /ask_model 5 Привет!").quoted(),
            ]));
        }
        let Some(model) = self.db.model_by_id(id)? else {
            return Ok(Outcome::idle(vec![
                Reply::text(format!("❌ Модель с ID {id} не найдена.\nПроверьте список моделей: /models")).quoted(),
            ]));
        };

        let text = match self.complete(&model, question).await {
            Ok((answer, ms)) => {
                let mut text = format!(
                    "{answer}\n\n⏱️ {ms} мс | 🤖 {}\n📋 ID модели: {}",
                    html_escape(&model.label),
                    model.id
                );
                if let Some(active) = self.db.active_model()?.filter(|a| a.id != model.id) {
                    text.push_str(&format!(
                        "\n⚠️ Это разовый запрос. Активная модель осталась: {}",
                        html_escape(&active.label)
                    ));
                }
                text
            }
            Err(text) => text,
        };
        Ok(Outcome::idle(vec![Reply::text(text).quoted()]))
    }

    /// Escaped answer and latency in ms, or the error text to show.
    async fn complete(&self, model: &LlmModel, question: &str) -> std::result::Result<(String, u128), String> {
        let Some(client) = &self.llm else {
            return Err("❌ OpenRouter не настроен: задайте OPENROUTER_API_KEY.".to_string());
        };
        let question: String = question.chars().take(QUESTION_MAX_CHARS).collect();
        let messages = [Message::system(ASSISTANT_PROMPT), Message::user(question)];

        match client.chat(&model.key, &messages, ASK_SAMPLING).await {
            Ok(completion) => {
                let answer: String = completion.content.trim().chars().take(ANSWER_MAX_CHARS).collect();
                Ok((html_escape(&answer), completion.elapsed.as_millis()))
            }
            Err(e) => {
                warn!("OpenRouter request to {} failed: {e}", model.key);
                Err(format!("❌ Ошибка OpenRouter: {}", html_escape(&e.to_string())))
            }
        }
    }
}

fn prompt(next: State, text: &str) -> Outcome {
    let keyboard = match next {
        State::Idle => Keyboard::Main,
        _ => Keyboard::Cancel,
    };
    Outcome::to(next, vec![Reply::text(text).keyboard(keyboard)])
}

fn food_capacity_reached(limit: usize) -> Outcome {
    Outcome::idle(vec![
        Reply::text(format!(
            "❌ Достигнут лимит записей в дневнике ({limit} шт.). Удалите старые через /food_del."
        ))
        .keyboard(Keyboard::Main),
    ])
}

/// Explain the rejected input and wait for another list.
fn retry_numbers(purpose: NumbersPurpose, reason: String) -> Outcome {
    Outcome::to(
        State::AwaitingNumbers(purpose),
        vec![
            Reply::text(reason).quoted(),
            Reply::text("Попробуйте еще раз. Введите числа:").keyboard(Keyboard::Cancel),
        ],
    )
}
