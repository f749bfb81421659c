//! Terminal rendering of markdown output
//!
//! Everything the engine displays is markdown. On a terminal it is rendered
//! with termimad; with `--no-color` it is printed as-is.

use anyhow::Result;
use termimad::{crossterm::style::Color, MadSkin};

pub struct TerminalRenderer {
    rich_enabled: bool,
    skin: MadSkin,
}

impl TerminalRenderer {
    pub fn new(rich_enabled: bool) -> Self {
        let mut skin = MadSkin::default();

        skin.set_headers_fg(Color::Blue);
        skin.bold.set_fg(Color::Yellow);
        skin.italic.set_fg(Color::Magenta);
        skin.inline_code.set_bg(Color::AnsiValue(238));

        Self { rich_enabled, skin }
    }

    /// Markdown as it will appear on the terminal.
    pub fn format(&self, markdown: &str) -> String {
        if self.rich_enabled {
            self.skin.term_text(markdown).to_string()
        } else {
            markdown.to_string()
        }
    }

    pub fn render(&self, markdown: &str) -> Result<()> {
        print!("{}", self.format(markdown));
        Ok(())
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}
