use teloxide::utils::command::BotCommands;

/// Every slash command. Arguments are kept raw; handlers parse them.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "Команды:")]
pub enum Command {
    #[command(description = "начать работу")]
    Start,
    #[command(description = "справка")]
    Help,
    #[command(description = "о боте")]
    About,
    #[command(description = "проверка работы бота")]
    Ping,
    #[command(description = "скрыть клавиатуру")]
    Hide,
    #[command(description = "показать клавиатуру")]
    Show,
    #[command(description = "сложить числа")]
    Sum(String),
    #[command(description = "найти максимум")]
    Max(String),
    #[command(description = "текущая погода")]
    Weather,
    #[command(description = "подтверждение действия")]
    Confirm,
    #[command(description = "отменить текущее действие")]
    Cancel,
    #[command(description = "добавить заметку")]
    NoteAdd(String),
    #[command(description = "последние заметки")]
    NoteList,
    #[command(description = "поиск заметок")]
    NoteFind(String),
    #[command(description = "редактировать заметку")]
    NoteEdit(String),
    #[command(description = "удалить заметку")]
    NoteDel(String),
    #[command(description = "количество заметок")]
    NoteCount,
    #[command(description = "экспорт заметок в файл")]
    NoteExport,
    #[command(description = "статистика заметок")]
    Stats,
    #[command(description = "записать прием пищи")]
    Add(String),
    #[command(description = "питание за сегодня")]
    Today,
    #[command(description = "питание за неделю")]
    Week,
    #[command(description = "питание за месяц")]
    Month,
    #[command(description = "график калорий за неделю")]
    Chart,
    #[command(description = "общая статистика дневника")]
    Diary,
    #[command(description = "удалить запись о еде")]
    FoodDel(String),
    #[command(description = "список моделей AI")]
    Models,
    #[command(description = "выбрать активную модель")]
    Model(String),
    #[command(description = "задать вопрос активной модели")]
    Ask(String),
    #[command(description = "задать вопрос конкретной модели")]
    AskModel(String),
}

/// Commands behind the food-diary reply-keyboard buttons.
pub fn from_button(text: &str) -> Option<Command> {
    let command = match text.trim() {
        "➕ Добавить еду" => Command::Add(String::new()),
        "📊 Сегодня" => Command::Today,
        "📈 Неделя" => Command::Week,
        "📅 Месяц" => Command::Month,
        "📊 График" => Command::Chart,
        "📋 Дневник" => Command::Diary,
        "🆘 Помощь" => Command::Help,
        "❌ Отмена" => Command::Cancel,
        _ => return None,
    };
    Some(command)
}
