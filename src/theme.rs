use std::fmt;
use std::str::FromStr;

use ratatui::style::Color;

use crate::storage::KeyValueStore;

pub const THEME_STORAGE_KEY: &str = "logistics-doc-ai-theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThemePreference {
    #[default]
    Light,
    Dark,
}

impl ThemePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemePreference::Light => "light",
            ThemePreference::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemePreference::Light => ThemePreference::Dark,
            ThemePreference::Dark => ThemePreference::Light,
        }
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(ThemePreference::Light),
            "dark" => Ok(ThemePreference::Dark),
            other => Err(format!("unknown theme '{}', expected light or dark", other)),
        }
    }
}

/// Source of the operating environment's colour-scheme preference.
pub trait SystemAppearance {
    /// `Some(true)` for dark, `Some(false)` for light, `None` if unknown.
    fn prefers_dark(&self) -> Option<bool>;
}

pub struct TerminalAppearance;

impl SystemAppearance for TerminalAppearance {
    fn prefers_dark(&self) -> Option<bool> {
        std::env::var("COLORFGBG").ok().and_then(|v| parse_colorfgbg(&v))
    }
}

/// `COLORFGBG` is `fg;bg` or `fg;default;bg`; only the background matters.
pub fn parse_colorfgbg(value: &str) -> Option<bool> {
    let bg: u8 = value.rsplit(';').next()?.trim().parse().ok()?;
    match bg {
        0..=6 | 8 => Some(true),
        7 | 9..=15 => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Color,
    pub foreground: Color,
    pub muted: Color,
    pub accent: Color,
    pub border: Color,
    pub highlight: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Palette {
    pub fn for_theme(theme: ThemePreference) -> Self {
        match theme {
            ThemePreference::Light => Palette {
                background: Color::Rgb(250, 250, 250),
                foreground: Color::Rgb(24, 24, 27),
                muted: Color::Rgb(113, 113, 122),
                accent: Color::Rgb(63, 63, 70),
                border: Color::Rgb(212, 212, 216),
                highlight: Color::Rgb(228, 228, 231),
                success: Color::Rgb(5, 150, 105),
                warning: Color::Rgb(180, 83, 9),
                error: Color::Rgb(185, 28, 28),
            },
            ThemePreference::Dark => Palette {
                background: Color::Rgb(9, 9, 11),
                foreground: Color::Rgb(244, 244, 245),
                muted: Color::Rgb(161, 161, 170),
                accent: Color::Rgb(212, 212, 216),
                border: Color::Rgb(63, 63, 70),
                highlight: Color::Rgb(39, 39, 42),
                success: Color::Rgb(52, 211, 153),
                warning: Color::Rgb(251, 191, 36),
                error: Color::Rgb(248, 113, 113),
            },
        }
    }
}

/// Light/dark preference with persistence. Constructed once and handed to
/// whatever renders.
pub struct ThemeStore<S: KeyValueStore> {
    storage: S,
    current: ThemePreference,
    palette: Palette,
}

impl<S: KeyValueStore> ThemeStore<S> {
    /// Resolves the stored value, else the system preference, else light.
    pub fn init(storage: S, appearance: &dyn SystemAppearance) -> Self {
        let stored = storage
            .get(THEME_STORAGE_KEY)
            .and_then(|v| v.parse::<ThemePreference>().ok());
        let current = match stored {
            Some(theme) => theme,
            None => match appearance.prefers_dark() {
                Some(true) => ThemePreference::Dark,
                _ => ThemePreference::Light,
            },
        };
        tracing::debug!("Theme resolved to {} (stored: {:?})", current, stored);
        Self {
            storage,
            current,
            palette: Palette::for_theme(current),
        }
    }

    pub fn get(&self) -> ThemePreference {
        self.current
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn toggle(&mut self) -> ThemePreference {
        self.set(self.current.toggled());
        self.current
    }

    /// Persists `theme` and makes it the only active palette.
    pub fn set(&mut self, theme: ThemePreference) {
        self.current = theme;
        self.palette = Palette::for_theme(theme);
        self.storage.set(THEME_STORAGE_KEY, theme.as_str());
        tracing::info!("Theme set to {}", theme);
    }
}
