//! Process-wide stack-trace rendering format.
//!
//! Sinks receive stack text already rendered in one agreed format. The
//! format is process-wide state written exactly once (the recovery stage
//! initializes it at construction) and read on every
//! [`EventBuilder::stack`](crate::EventBuilder::stack) call. Concurrent
//! initialization is harmless: the first value wins and later calls observe
//! it.

use std::sync::OnceLock;

/// How captured call-stack text is rendered into the `stack` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackFormat {
    /// Keep the backtrace as multi-line text.
    #[default]
    Multiline,
    /// Fold the backtrace onto one line, frames separated by `" | "`.
    Folded,
}

static STACK_FORMAT: OnceLock<StackFormat> = OnceLock::new();

/// Initializes the process-wide stack format.
///
/// Idempotent: the first call wins and every call returns the effective
/// format.
pub fn init_stack_format(format: StackFormat) -> StackFormat {
    *STACK_FORMAT.get_or_init(|| format)
}

/// Returns the effective stack format (default before any initialization).
#[must_use]
pub fn stack_format() -> StackFormat {
    STACK_FORMAT.get().copied().unwrap_or_default()
}

/// Renders stack text according to the process-wide format.
pub(crate) fn render(text: &str) -> String {
    render_with(stack_format(), text)
}

fn render_with(format: StackFormat, text: &str) -> String {
    match format {
        StackFormat::Multiline => text.to_owned(),
        StackFormat::Folded => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" | "),
    }
}
