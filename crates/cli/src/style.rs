//! Terminal styling for persondir output.

use console::Style;

/// Completed step, e.g. a written file or a passed validation check.
pub fn success(msg: &str) -> String {
    format!("{} {}", Style::new().green().apply_to("ok"), msg)
}

/// Failed validation check or fatal command error.
pub fn error(msg: &str) -> String {
    format!("{} {}", Style::new().red().bold().apply_to("error:"), msg)
}

/// Lookups that resolved nothing.
pub fn warn(msg: &str) -> String {
    format!("{} {}", Style::new().yellow().apply_to("note:"), msg)
}

/// Person name above an attribute table.
pub fn header(msg: &str) -> String {
    Style::new().cyan().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}
