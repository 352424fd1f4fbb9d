//! Message formatting utilities for client display.

use hibiki_shared::time::format_jst_clock;

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a text frame relayed by the server
    ///
    /// # Arguments
    ///
    /// * `text` - The frame payload
    /// * `received_at` - Unix timestamp when the frame arrived (milliseconds)
    pub fn format_received(text: &str, received_at: i64) -> String {
        format!("\r[{}] {}\n", format_jst_clock(received_at), text)
    }

    /// Format a binary frame notification
    pub fn format_binary_message(byte_count: usize, received_at: i64) -> String {
        format!(
            "\r[{}] <{} bytes of binary data>\n",
            format_jst_clock(received_at),
            byte_count
        )
    }

    /// Format the banner shown once a connection is up
    pub fn format_connected(url: &str) -> String {
        format!(
            "\nConnected to {}. Type messages and press Enter to send. Press Ctrl+C to exit.\n",
            url
        )
    }
}
