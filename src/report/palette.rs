//! Display tokens for terminal output.

/// Escape sequences spliced around highlighted text. Every token is empty
/// in a plain palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub red: &'static str,
    pub yellow: &'static str,
    pub green: &'static str,
    pub reset: &'static str,
    pub bright: &'static str,
    pub reset_all: &'static str,
}

impl Palette {
    pub const fn plain() -> Self {
        Self {
            red: "",
            yellow: "",
            green: "",
            reset: "",
            bright: "",
            reset_all: "",
        }
    }

    pub const fn ansi() -> Self {
        Self {
            red: "\x1b[31m",
            yellow: "\x1b[33m",
            green: "\x1b[32m",
            reset: "\x1b[39m",
            bright: "\x1b[1m",
            reset_all: "\x1b[0m",
        }
    }

    /// ANSI tokens when stdout is a color-capable terminal. AppVeyor
    /// consoles print escape sequences verbatim, so colors stay off there.
    pub fn detect() -> Self {
        if std::env::var_os("APPVEYOR").is_some() {
            return Self::plain();
        }
        let term = console::Term::stdout();
        if console::colors_enabled() && term.features().colors_supported() {
            Self::ansi()
        } else {
            Self::plain()
        }
    }

    pub fn ok(&self) -> String {
        format!("{}OK{}", self.green, self.reset)
    }

    pub fn failed(&self) -> String {
        format!("{}FAILED{}", self.red, self.reset)
    }

    pub fn emphasize(&self, text: &str) -> String {
        format!("{}{}{}", self.bright, text, self.reset_all)
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::plain()
    }
}
