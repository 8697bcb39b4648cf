use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Style};
use colored::Color;
use once_cell::sync::Lazy;

/// CLI color theme configuration
pub struct ColorTheme {
    pub success: Color,
    pub warning: Color,
    pub info: Color,
    pub highlight: Color,
    pub muted: Color,
    pub primary: Color,
    pub secondary: Color,
    pub key: Color,
    pub value: Color,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: Color::Green,
            warning: Color::Yellow,
            info: Color::Blue,
            highlight: Color::Cyan,
            muted: Color::BrightBlack,
            primary: Color::BrightBlue,
            secondary: Color::Magenta,
            key: Color::BrightCyan,
            value: Color::White,
        }
    }
}

/// Global theme instance
pub static THEME: Lazy<ColorTheme> = Lazy::new(ColorTheme::default);

/// clap help styles in the same palette as [`ColorTheme::default`].
pub fn help_styles() -> Styles {
    let fg = |color: AnsiColor| Style::new().fg_color(Some(color.into()));
    Styles::styled()
        .usage(fg(AnsiColor::BrightBlue).bold())
        .header(fg(AnsiColor::Cyan).bold())
        .literal(fg(AnsiColor::Magenta))
        .placeholder(fg(AnsiColor::BrightBlack))
        .valid(fg(AnsiColor::Green))
        .invalid(fg(AnsiColor::Yellow))
        .error(fg(AnsiColor::Red).bold())
}

/// Icons for different message types
pub struct Icons {
    pub success: &'static str,
    pub warning: &'static str,
    pub info: &'static str,
    pub arrow: &'static str,
}

pub const ICONS: Icons = Icons {
    success: "✓",
    warning: "⚠",
    info: "ℹ",
    arrow: "→",
};
