//! # Utilities Module
//!
//! ## Purpose
//! Common helpers used throughout the pipeline: performance timing and
//! character-safe text truncation for Cyrillic-heavy inputs.
//!
//! ## Input/Output Specification
//! - **Input**: Text slices and operation names
//! - **Output**: Truncated/previewed text, elapsed timings
//!
//! ## Key Features
//! - Character-count truncation that never splits a UTF-8 code point
//! - Lightweight operation timers wired into tracing

use std::time::Instant;

/// Performance timer for measuring operation duration
pub struct Timer {
    start: Instant,
    name: String,
}

/// Text processing utilities
pub struct TextUtils;

impl Timer {
    /// Start a new timer with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Stop timer and log duration
    pub fn stop(self) -> u64 {
        let elapsed = self.elapsed_ms();
        tracing::debug!("Timer '{}' completed in {}ms", self.name, elapsed);
        elapsed
    }
}

impl TextUtils {
    /// Truncate to at most `max_chars` characters, respecting UTF-8 boundaries.
    /// Counts characters, not bytes: Cyrillic text is two bytes per character.
    pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
        match text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => &text[..byte_idx],
            None => text,
        }
    }

    /// Short display preview with ellipsis, for log messages
    pub fn preview(text: &str, max_chars: usize) -> String {
        let trimmed = text.trim();
        if trimmed.chars().count() <= max_chars {
            trimmed.to_string()
        } else {
            format!("{}...", Self::truncate_chars(trimmed, max_chars))
        }
    }

    /// Count words in text
    pub fn word_count(text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Macro for timing code blocks
#[macro_export]
macro_rules! time_block {
    ($name:expr, $block:block) => {{
        let timer = $crate::utils::Timer::new($name);
        let result = $block;
        timer.stop();
        result
    }};
}
