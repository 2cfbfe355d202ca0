//! Styles for the shelter CLI.
//!
//! Render code asks for a style by what the text *is* (a badge, a muted
//! detail, an error) and never picks colors itself. `console` drops the escape
//! codes when stdout is not a terminal.

use console::Style;

pub fn header() -> Style {
    Style::new().bold().underlined()
}

pub fn badge() -> Style {
    Style::new().cyan().bold()
}

pub fn muted() -> Style {
    Style::new().dim()
}

pub fn pending() -> Style {
    Style::new().yellow()
}

pub fn success() -> Style {
    Style::new().green()
}

pub fn info() -> Style {
    Style::new().blue()
}

pub fn warning() -> Style {
    Style::new().yellow().bold()
}

pub fn error() -> Style {
    Style::new().red().bold()
}
