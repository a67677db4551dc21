//! Virtual 2x16 character LCD.
//!
//! [`LcdDisplay`] is the [`StatusSink`] used on the device. Each message
//! replaces the whole frame: the primary text goes to the top row, the
//! secondary text to the bottom row.
//!
//! # Character Set
//!
//! The panel only has ASCII glyphs. Any other character (for example an
//! accented attendee name sent by the server) is shown as `?`. Control
//! characters are dropped. Leading spaces are kept, since the predefined
//! messages use them for centering.
//!
//! # Examples
//!
//! ```
//! use fingerlink_device::LcdDisplay;
//! use fingerlink_device::status::{StatusSink, texts};
//!
//! let mut lcd = LcdDisplay::new();
//! lcd.notify(texts::WELCOME, "José");
//!
//! assert_eq!(lcd.row(0), Some("Welcome:        "));
//! assert_eq!(lcd.row(1), Some("Jos?            "));
//! ```

use tracing::debug;

use crate::status::StatusSink;

/// Rows on the panel.
pub const LCD_ROWS: usize = 2;

/// Columns per row.
pub const LCD_COLUMNS: usize = 16;

/// Virtual character LCD.
#[derive(Debug, Clone)]
pub struct LcdDisplay {
    columns: usize,

    /// Current frame, each row exactly `columns` characters.
    frame: [String; LCD_ROWS],

    /// Number of frames shown since creation.
    updates: u64,
}

impl LcdDisplay {
    /// Create a blank 2x16 display.
    pub fn new() -> Self {
        Self::with_columns(LCD_COLUMNS)
    }

    /// Create a blank display with a custom row width.
    pub fn with_columns(columns: usize) -> Self {
        let blank = " ".repeat(columns);
        Self {
            columns,
            frame: [blank.clone(), blank],
            updates: 0,
        }
    }

    /// Text on row `row` (0-based), padded to the full width.
    pub fn row(&self, row: usize) -> Option<&str> {
        self.frame.get(row).map(String::as_str)
    }

    /// Both rows.
    pub fn frame(&self) -> &[String; LCD_ROWS] {
        &self.frame
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Frame as it would look on the panel, one row per line.
    pub fn render(&self) -> String {
        self.frame.join("\n")
    }
}

impl Default for LcdDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for LcdDisplay {
    fn notify(&mut self, primary: &str, secondary: &str) {
        self.frame = [
            fit_row(primary, self.columns),
            fit_row(secondary, self.columns),
        ];
        self.updates += 1;
        debug!(top = %self.frame[0], bottom = %self.frame[1], "LCD");
    }
}

/// Render `text` as one panel row: exactly `width` ASCII characters.
///
/// # Examples
///
/// ```
/// use fingerlink_device::display::fit_row;
///
/// assert_eq!(fit_row("OK", 4), "OK  ");
/// assert_eq!(fit_row("Successfully", 4), "Succ");
/// assert_eq!(fit_row("Zoë", 4), "Zo? ");
/// ```
pub fn fit_row(text: &str, width: usize) -> String {
    let mut row: String = text
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c.is_ascii() { c } else { '?' })
        .take(width)
        .collect();

    let len = row.chars().count();
    row.extend(std::iter::repeat_n(' ', width - len));
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::texts;

    #[test]
    fn test_new_display_is_blank() {
        let lcd = LcdDisplay::new();
        assert_eq!(lcd.row(0), Some("                "));
        assert_eq!(lcd.row(1), Some("                "));
        assert_eq!(lcd.row(2), None);
        assert_eq!(lcd.updates(), 0);
    }

    #[test]
    fn test_notify_replaces_frame() {
        let mut lcd = LcdDisplay::new();
        lcd.show(texts::ENROLL_SUCCESS);
        lcd.show(texts::CLIENT_START);

        assert_eq!(lcd.row(0), Some("  Client Start  "));
        assert_eq!(lcd.row(1), Some("                "));
        assert_eq!(lcd.updates(), 2);
    }

    #[test]
    fn test_overlong_text_is_truncated() {
        let mut lcd = LcdDisplay::new();
        // One column too wide.
        lcd.show(texts::CONN_SERVER_DONE);
        assert_eq!(lcd.row(1), Some("  conn Server.  "));
    }

    #[test]
    fn test_control_characters_dropped() {
        assert_eq!(fit_row("A\tB\r", 4), "AB  ");
    }

    #[test]
    fn test_render() {
        let mut lcd = LcdDisplay::with_columns(4);
        lcd.notify("ab", "cd");
        assert_eq!(lcd.render(), "ab  \ncd  ");
    }
}
