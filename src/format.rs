//! HTML text blocks sent back to the chat.
//!
//! Everything here is pure; user-provided text is escaped before it is
//! embedded in markup.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt::Write;

use crate::analytics::{self, Recommendation, Trend, WeeklyAnalysis};
use crate::nutrition::{Nutrients, NutritionRecord, Provenance};
use crate::store::{DATE_FORMAT, ENTRY_CAPACITY, Entry, LlmModel, NoteStats, PeriodTotals};

const RULE: &str = "═══════════════════════════════════";
const SHORT_RULE: &str = "═════════════════════════";
const THIN_RULE: &str = "──────────────────────────────";

const LIST_PREVIEW_CHARS: usize = 100;
const FIND_PREVIEW_CHARS: usize = 150;
const BAR_WIDTH: usize = 20;
const TOP_WORDS: usize = 5;

const MONTHS: [&str; 12] = [
    "ЯНВАРЬ", "ФЕВРАЛЬ", "МАРТ", "АПРЕЛЬ", "МАЙ", "ИЮНЬ",
    "ИЮЛЬ", "АВГУСТ", "СЕНТЯБРЬ", "ОКТЯБРЬ", "НОЯБРЬ", "ДЕКАБРЬ",
];

/// Escape text for Telegram's HTML parse mode.
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            _ => result.push(c),
        }
    }
    result
}

/// First `max_chars` characters, with `...` appended when something was cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}

/// `1234567` -> `1,234,567`.
fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn bar(value: usize, of: usize, width: usize) -> String {
    let filled = if of == 0 { 0 } else { (value * width / of).min(width) };
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn day_label(date: &str) -> String {
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map(|d| d.format("%d.%m").to_string())
        .unwrap_or_else(|_| date.to_string())
}

fn month_label(period: &str) -> String {
    let parsed = period
        .split_once('-')
        .and_then(|(y, m)| Some((y.parse::<i32>().ok()?, m.parse::<usize>().ok()?)));
    match parsed {
        Some((year, month @ 1..=12)) => format!("{} {year}", MONTHS[month - 1]),
        _ => period.to_string(),
    }
}

fn macro_lines(out: &mut String, protein: f64, fat: f64, carbs: f64) {
    let _ = writeln!(out, "• 🥚 Белки: <code>{protein:.1} г</code>");
    let _ = writeln!(out, "• 🥑 Жиры: <code>{fat:.1} г</code>");
    let _ = writeln!(out, "• 🍚 Углеводы: <code>{carbs:.1} г</code>");
}

fn balance_block(out: &mut String, nutrients: &Nutrients) {
    if let Some((p, f, c)) = nutrients.macro_balance() {
        out.push_str("📈 <b>БАЛАНС БЖУ:</b>\n");
        let _ = writeln!(out, "• 🥚 Белки: <code>{p:.1}%</code>");
        let _ = writeln!(out, "• 🥑 Жиры: <code>{f:.1}%</code>");
        let _ = writeln!(out, "• 🍚 Углеводы: <code>{c:.1}%</code>");
    }
}

// ==================== FOOD DIARY ====================

/// Label of the meal eaten at `hour` (0-23).
pub fn meal_time(hour: u32) -> &'static str {
    match hour {
        5..=10 => "завтрак 🍳",
        11..=15 => "обед 🍲",
        16..=21 => "ужин 🍽",
        _ => "ночной перекус 🌙",
    }
}

pub fn provenance_line(provenance: Provenance) -> &'static str {
    match provenance {
        Provenance::LocalDb => "📊 Данные из локальной базы",
        Provenance::OpenRouter => "🤖 Анализ от нейросети",
        Provenance::FallbackEstimate => "⚖️ Примерная оценка",
    }
}

pub fn nutrition_response(description: &str, record: &NutritionRecord, meal: &str) -> String {
    let n = &record.nutrients;
    let mut out = format!("🍽 <b>АНАЛИЗ ПРИЕМА ПИЩИ</b> ({meal})\n{RULE}\n\n");
    let _ = writeln!(out, "📋 <b>Что съели:</b>\n<code>{}</code>\n", html_escape(description));
    out.push_str("📊 <b>ПИЩЕВАЯ ЦЕННОСТЬ:</b>\n");
    let _ = writeln!(out, "• 🔥 <b>Калории:</b> <code>{} ккал</code>", n.calories);
    macro_lines(&mut out, n.protein_g, n.fat_g, n.carbs_g);
    let _ = writeln!(out, "\n💡 <b>РЕКОМЕНДАЦИИ:</b>\n<i>{}</i>\n", html_escape(&record.advice));
    out.push_str("✅ <b>Записано в дневник питания!</b>\n\n");
    out.push_str(provenance_line(record.provenance));
    out
}

pub fn daily_summary(totals: Option<&Nutrients>, entries: &[Entry]) -> String {
    let Some(totals) = totals else {
        return format!(
            "📅 <b>СЕГОДНЯ</b>\n{RULE}\n\n📭 <b>Записей нет</b>\n\nИспользуйте ➕ Добавить еду чтобы начать!"
        );
    };

    let mut out = format!("📅 <b>СЕГОДНЯ</b>\n{RULE}\n\n📊 <b>СУММАРНЫЕ ПОКАЗАТЕЛИ:</b>\n");
    let _ = writeln!(out, "• 🔥 <b>Калории:</b> <code>{} ккал</code>", totals.calories);
    macro_lines(&mut out, totals.protein_g, totals.fat_g, totals.carbs_g);
    out.push('\n');
    balance_block(&mut out, totals);

    if !entries.is_empty() {
        out.push_str("\n🍽 <b>ПРИЕМЫ ПИЩИ:</b>\n");
        for (i, entry) in entries.iter().enumerate() {
            let n = entry.nutrients.unwrap_or_default();
            let _ = write!(
                out,
                "\n{}. <b>{}</b> - {} <i>#{}</i>\n   🔥 {} ккал | 🥚 {:.1}г | 🥑 {:.1}г | 🍚 {:.1}г\n",
                i + 1,
                entry.created_time(),
                html_escape(&entry.body),
                entry.id,
                n.calories,
                n.protein_g,
                n.fat_g,
                n.carbs_g
            );
        }
    }
    out
}

fn averages(days: &[PeriodTotals]) -> (f64, f64, f64, f64) {
    let count = days.len().max(1) as f64;
    let sum = days.iter().fold((0.0, 0.0, 0.0, 0.0), |acc, d| {
        (
            acc.0 + d.totals.calories as f64,
            acc.1 + d.totals.protein_g,
            acc.2 + d.totals.fat_g,
            acc.3 + d.totals.carbs_g,
        )
    });
    (sum.0 / count, sum.1 / count, sum.2 / count, sum.3 / count)
}

fn analysis_block(analysis: &WeeklyAnalysis) -> String {
    let WeeklyAnalysis::Stats(stats) = analysis else {
        return "\n\n📭 <b>Нет данных о калориях</b>".to_string();
    };
    let mut out = format!("\n\n📊 <b>АНАЛИТИКА НЕДЕЛИ</b>\n{SHORT_RULE}\n\n🔥 <b>СТАТИСТИКА КАЛОРИЙ:</b>\n");
    let _ = writeln!(out, "• Диапазон: <code>{} - {} ккал</code>", stats.min, stats.max);
    let _ = write!(out, "• Разброс: <code>{} ккал</code>", stats.spread);
    if let Some(v) = &stats.variability {
        let _ = write!(out, "\n• Стандартное отклонение: <code>{:.0} ккал</code>\n", v.std_dev);
        out.push_str(if v.high {
            "  ⚠️ <b>Большой разброс в питании</b>"
        } else {
            "  ✅ <b>Стабильное питание</b>"
        });
    }
    out
}

pub fn trend_text(trend: Trend) -> &'static str {
    match trend {
        Trend::Rising => "📈 <b>РАСТУЩИЙ ТРЕНД</b>\nКалорийность увеличивается",
        Trend::Falling => "📉 <b>НИСХОДЯЩИЙ ТРЕНД</b>\nКалорийность уменьшается",
        Trend::Stable => "➡️ <b>СТАБИЛЬНЫЙ ТРЕНД</b>\nКалорийность стабильна",
    }
}

pub fn recommendation_text(rec: Recommendation) -> &'static str {
    match rec {
        Recommendation::TooFewCalories => "⚠️ <b>СЛИШКОМ МАЛО КАЛОРИЙ</b>\n  Рекомендуется увеличить потребление.",
        Recommendation::HighIntake => "⚠️ <b>ВЫСОКОЕ ПОТРЕБЛЕНИЕ</b>\n  Рассмотрите уменьшение порций.",
        Recommendation::NormalIntake => "✅ <b>НОРМАЛЬНОЕ ПОТРЕБЛЕНИЕ</b>\n  Поддерживайте текущий уровень.",
        Recommendation::AddProtein => "🥚 <b>ДОБАВЬТЕ БЕЛКА</b>\n  Мясо, рыба, творог, яйца.",
        Recommendation::AddFat => "🥑 <b>ДОБАВЬТЕ ПОЛЕЗНЫХ ЖИРОВ</b>\n  Орехи, авокадо, оливковое масло.",
        Recommendation::AddCarbs => "🍚 <b>ДОБАВЬТЕ СЛОЖНЫХ УГЛЕВОДОВ</b>\n  Крупы, цельнозерновые продукты.",
    }
}

/// Week report; from three recorded days on it adds analytics, the trend
/// and recommendations for the daily averages.
pub fn weekly_report(days: &[PeriodTotals]) -> String {
    if days.is_empty() {
        return format!(
            "📈 <b>НЕДЕЛЯ</b>\n{RULE}\n\n📭 <b>Недостаточно данных</b>\n\nДобавьте записи за последние 7 дней."
        );
    }

    let total: i64 = days.iter().map(|d| d.totals.calories).sum();
    let max = days.iter().map(|d| d.totals.calories).max().unwrap_or(0);
    let min = days.iter().map(|d| d.totals.calories).min().unwrap_or(0);
    let (avg_cal, avg_protein, avg_fat, avg_carbs) = averages(days);

    let mut out = format!("📈 <b>НЕДЕЛЯ</b>\n{RULE}\n\n📅 <b>Период:</b> {} дней\n\n", days.len());
    out.push_str("🔥 <b>КАЛОРИИ:</b>\n");
    let _ = writeln!(out, "• Всего: <code>{} ккал</code>", thousands(total));
    let _ = writeln!(out, "• Среднее: <code>{avg_cal:.0} ккал/день</code>");
    let _ = writeln!(out, "• Максимум: <code>{max} ккал</code>");
    let _ = writeln!(out, "• Минимум: <code>{min} ккал</code>\n");
    out.push_str("🥗 <b>СРЕДНИЕ ПОКАЗАТЕЛИ В ДЕНЬ:</b>\n");
    macro_lines(&mut out, avg_protein, avg_fat, avg_carbs);

    out.push_str("\n📊 <b>ПО ДНЯМ:</b>\n");
    for d in days {
        let t = &d.totals;
        let _ = write!(
            out,
            "\n• <b>{}</b>:\n  🔥 {} ккал | 🥚 {:.1}г | 🥑 {:.1}г | 🍚 {:.1}г",
            day_label(&d.period),
            t.calories,
            t.protein_g,
            t.fat_g,
            t.carbs_g
        );
    }

    if days.len() >= 3 {
        out.push_str(&analysis_block(&analytics::weekly_analysis(days)));
        if let Some(trend) = analytics::trend_analysis(days) {
            let _ = write!(out, "\n\n📈 <b>ТРЕНДЫ:</b>\n{}", trend_text(trend));
        }
        let _ = write!(out, "\n\n💡 <b>РЕКОМЕНДАЦИИ:</b>\n{SHORT_RULE}\n");
        for rec in analytics::recommendations(avg_cal, avg_protein, avg_fat, avg_carbs) {
            let _ = write!(out, "\n• {}\n", recommendation_text(rec));
        }
    }
    out
}

pub fn monthly_report(months: &[PeriodTotals]) -> String {
    if months.is_empty() {
        return format!(
            "📅 <b>МЕСЯЦ</b>\n{RULE}\n\n📭 <b>Недостаточно данных</b>\n\nДобавьте записи за последний месяц."
        );
    }

    let mut out = format!("📅 <b>МЕСЯЦ</b>\n{RULE}\n\n");
    for month in months {
        let (cal, protein, fat, carbs) = month.daily_average();
        let _ = write!(out, "📅 <b>{}</b> ({} дней)\n{THIN_RULE}\n\n", month_label(&month.period), month.days);
        out.push_str("📊 <b>СРЕДНИЕ ПОКАЗАТЕЛИ В ДЕНЬ:</b>\n");
        let _ = writeln!(out, "• 🔥 Калории: <code>{cal:.0} ккал</code>");
        macro_lines(&mut out, protein, fat, carbs);
        out.push('\n');
        balance_block(&mut out, &Nutrients { calories: cal as i64, protein_g: protein, fat_g: fat, carbs_g: carbs });
        let _ = write!(out, "\n{RULE}\n\n");
    }
    out
}

/// Text bar chart of daily calories; needs at least two days.
pub fn weekly_chart(days: &[PeriodTotals]) -> String {
    if days.len() < 2 {
        return "📊 <b>Недостаточно данных для графика</b>\n\n\
                Нужно минимум 2 дня записей.\n\
                Используйте <b>➕ Добавить еду</b> чтобы заполнить дневник!"
            .to_string();
    }

    let peak = days.iter().map(|d| d.totals.calories.max(0)).max().unwrap_or(0) as usize;
    let mut out = format!("📈 <b>Ваша статистика за неделю</b>\n{RULE}\n\n<pre>");
    for d in days {
        let calories = d.totals.calories.max(0) as usize;
        let _ = writeln!(out, "{} {} {:>5} ккал", day_label(&d.period), bar(calories, peak, BAR_WIDTH), calories);
    }
    out.push_str("</pre>\n");

    let (_, protein, fat, carbs) = averages(days);
    out.push_str("🥗 <b>В среднем за день:</b>\n");
    macro_lines(&mut out, protein, fat, carbs);
    out.push_str("\nДобавляйте записи каждый день для более точной статистики!");
    out
}

/// The most frequent words (longer than two characters) across food descriptions.
pub fn top_words(entries: &[Entry], limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0;
    for word in entries.iter().flat_map(|e| e.body.split_whitespace()) {
        let word = word.to_lowercase();
        if word.chars().count() <= 2 {
            continue;
        }
        counts
            .entry(word)
            .and_modify(|(count, _)| *count += 1)
            .or_insert_with(|| {
                order += 1;
                (1, order)
            });
    }

    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));
    ranked.into_iter().take(limit).map(|(word, (count, _))| (word, count)).collect()
}

pub fn diary_stats(entries: &[Entry]) -> String {
    let mut out = format!("📊 <b>ОБЩАЯ СТАТИСТИКА</b>\n{RULE}\n\n");
    if entries.is_empty() {
        out.push_str("📭 <b>У вас еще нет записей</b>\n\nНачните с добавления первого приема пищи!");
        return out;
    }

    let _ = writeln!(out, "📝 <b>Всего записей:</b> <code>{}</code>\n", entries.len());
    let common = top_words(entries, TOP_WORDS);
    if !common.is_empty() {
        out.push_str("🍽 <b>ЧАСТЫЕ ПРОДУКТЫ:</b>\n");
        for (word, count) in common {
            let _ = writeln!(out, "• <code>{}</code>: {count} раз", html_escape(&word));
        }
        out.push('\n');
    }

    out.push_str("📱 <b>ДОСТУПНЫЕ ОТЧЕТЫ:</b>\n");
    out.push_str("• 📅 <b>Сегодня</b> - текущий день\n");
    out.push_str("• 📈 <b>Неделя</b> - анализ за 7 дней\n");
    out.push_str("• 📅 <b>Месяц</b> - сравнение по месяцам\n");
    out.push_str("• 📊 <b>График</b> - визуализация данных");
    out
}

// ==================== NOTES ====================

pub fn note_list(notes: &[Entry]) -> String {
    if notes.is_empty() {
        return "📭 У вас пока нет заметок. Используйте /note_add чтобы добавить первую.".to_string();
    }
    let mut out = String::from("📋 Ваши последние заметки:\n");
    for note in notes {
        let _ = write!(
            out,
            "\n#{} ({}):\n{}\n{}",
            note.id,
            note.created_date(),
            html_escape(&truncate_chars(&note.body, LIST_PREVIEW_CHARS)),
            "-".repeat(30)
        );
    }
    out
}

pub fn find_results(query: &str, notes: &[Entry]) -> String {
    let query = html_escape(query);
    if notes.is_empty() {
        return format!("🔍 Ничего не найдено по запросу «{query}».");
    }
    let mut out = format!("🔍 Результаты поиска («{query}»):\n");
    for note in notes {
        let _ = write!(out, "\n#{}: {}", note.id, html_escape(&truncate_chars(&note.body, FIND_PREVIEW_CHARS)));
    }
    out
}

fn usage_percent(count: usize) -> usize {
    count * 100 / ENTRY_CAPACITY
}

pub fn note_count(count: usize) -> String {
    let mut out = format!(
        "📊 Количество заметок: {count} из {ENTRY_CAPACITY}\n\
         Прогресс: <code>{}</code>\n\
         Использовано {count}/{ENTRY_CAPACITY} слотов ({}%)\n",
        bar(count, ENTRY_CAPACITY, BAR_WIDTH),
        usage_percent(count)
    );
    if count >= ENTRY_CAPACITY {
        out.push_str("\n⚠️ Лимит достигнут! Удалите старые заметки, чтобы добавить новые.");
    }
    out
}

pub fn note_stats(stats: &NoteStats) -> String {
    format!(
        "📊 <b>Статистика заметок</b>\n\n\
         <b>Использование слотов:</b>\n\
         <code>{bar}</code>\n\
         Заметок: <b>{total}</b> из <b>{ENTRY_CAPACITY}</b> ({pct}%)\n\
         📝 <b>Суммарный объем:</b> <code>{chars}</code> символов\n\
         {THIN_RULE}\n\
         <b>История действий (всего):</b>\n\
         ✅ Создано: <b>{}</b>\n\
         ✍️ Изменено: <b>{}</b>\n\
         🗑️ Удалено: <b>{}</b>\n\
         {THIN_RULE}\n\
         <b>Активность за неделю:</b>\n\
         ✅ Создано: <b>{}</b>\n\
         ✍️ Изменено: <b>{}</b>\n\
         🗑️ Удалено: <b>{}</b>\n\
         {THIN_RULE}\n\
         ℹ️ Используйте /note_count для быстрого просмотра количества заметок",
        stats.total_created,
        stats.total_edited,
        stats.total_deleted,
        stats.weekly_created,
        stats.weekly_edited,
        stats.weekly_deleted,
        bar = bar(stats.total_notes, ENTRY_CAPACITY, BAR_WIDTH),
        total = stats.total_notes,
        pct = usage_percent(stats.total_notes),
        chars = thousands(stats.total_chars as i64),
    )
}

/// Plain-text export of every note, oldest first.
pub fn export_document(username: &str, exported_at: &str, notes: &[Entry]) -> String {
    let heavy = "=".repeat(50);
    let light = "-".repeat(30);
    let mut out = format!(
        "Экспорт заметок для пользователя @{username}\n\
         Дата экспорта: {exported_at}\n\
         Всего заметок: {}\n\
         {heavy}\n\n",
        notes.len()
    );
    for note in notes {
        let _ = write!(
            out,
            "Заметка #{}\nДата создания: {}\n{light}\n{}\n{heavy}\n\n",
            note.id, note.created_at, note.body
        );
    }
    out
}

// ==================== MODELS ====================

pub fn model_list(models: &[LlmModel]) -> String {
    if models.is_empty() {
        return "Список моделей пуст.".to_string();
    }
    let mut out = String::from("Доступные модели:\n");
    for m in models {
        let star = if m.active { "★" } else { "  " };
        let _ = writeln!(out, "{star} {}. {}  [<code>{}</code>]", m.id, html_escape(&m.label), html_escape(&m.key));
    }
    out.push_str("\nАктивировать: /model &lt;ID&gt;");
    out
}
