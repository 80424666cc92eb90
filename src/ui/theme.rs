use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Terminal styles for the CLI's output roles
#[derive(Debug, Clone)]
pub struct Theme {
    /// Command banners and section titles
    pub heading: Style,
    pub ok: Style,
    pub failure: Style,
    pub caution: Style,
    /// Leading icon of a `label: value` line
    pub icon: Style,
    pub label: Style,
    pub muted: Style,
}

/// Colors only go to a terminal, and never when `NO_COLOR` is set
pub fn color_enabled(no_color: bool, is_term: bool) -> bool {
    is_term && !no_color
}

impl Theme {
    pub fn new(color: bool) -> Self {
        let style = |styled: Style| if color { styled } else { Style::new() };
        Self {
            heading: style(Style::new().cyan().bold()),
            ok: style(Style::new().green().bold()),
            failure: style(Style::new().red().bold()),
            caution: style(Style::new().yellow().bold()),
            icon: style(Style::new().blue()),
            label: style(Style::new().white().dimmed()),
            muted: style(Style::new().bright_black()),
        }
    }

    pub fn detect() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        Self::new(color_enabled(no_color, console::Term::stdout().is_term()))
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
