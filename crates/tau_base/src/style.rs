//! ANSI terminal styling for diagnostic output.
//!
//! All styling goes through [`Style`] so color can be disabled in one place
//! (piped output, `--log-level` plain modes, tests).

/// Applies ANSI escape styling when enabled, passes text through otherwise.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    enabled: bool,
}

impl Style {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn plain() -> Self {
        Self { enabled: false }
    }

    fn wrap(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    pub fn red(&self, text: &str) -> String {
        self.wrap("31", text)
    }

    pub fn yellow(&self, text: &str) -> String {
        self.wrap("33", text)
    }

    pub fn dim(&self, text: &str) -> String {
        self.wrap("90", text)
    }

    pub fn bold(&self, text: &str) -> String {
        self.wrap("1", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_style_wraps_with_escape_codes() {
        let style = Style::new(true);
        assert_eq!(style.red("x"), "\x1b[31mx\x1b[0m");
    }

    #[test]
    fn plain_style_passes_text_through() {
        let style = Style::plain();
        assert_eq!(style.red("x"), "x");
        assert_eq!(style.bold("x"), "x");
    }
}
