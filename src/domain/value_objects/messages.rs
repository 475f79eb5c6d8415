use serde::Serialize;

/// Placeholder replaced with a number in message templates
const PLACEHOLDER: &str = "{n}";

/// Player-facing restart announcements for one locale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Messages {
    /// Locale tag this table entry belongs to
    pub locale: &'static str,
    /// Warning sent once; `{n}` is the total notice period in seconds
    pub restart_warning: &'static str,
    /// Countdown line; `{n}` is the remaining second
    pub countdown: &'static str,
}

const EN: Messages = Messages {
    locale: "en",
    restart_warning: "Update received, restarting in {n} seconds",
    countdown: "Restarting in {n}",
};

const RU: Messages = Messages {
    locale: "ru",
    restart_warning: "Обновление получено, перезапуск через {n} секунд",
    countdown: "Перезапуск через {n}",
};

const TABLE: &[Messages] = &[EN, RU];

impl Messages {
    /// Pick the table entry for `locale`, falling back to English.
    ///
    /// Tags are matched case-insensitively on their language part, so
    /// `ru-RU` and `RU_ru` both select Russian.
    pub fn select(locale: &str) -> Self {
        let language = locale
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        TABLE
            .iter()
            .find(|entry| entry.locale == language)
            .copied()
            .unwrap_or(EN)
    }

    /// Locale tags with a dedicated table entry
    pub fn supported_locales() -> impl Iterator<Item = &'static str> {
        TABLE.iter().map(|entry| entry.locale)
    }

    pub fn warning(&self, notice_secs: u64) -> String {
        self.restart_warning.replace(PLACEHOLDER, &notice_secs.to_string())
    }

    pub fn countdown(&self, remaining: u32) -> String {
        self.countdown.replace(PLACEHOLDER, &remaining.to_string())
    }
}

impl Default for Messages {
    fn default() -> Self {
        EN
    }
}
