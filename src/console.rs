//! Colored output helpers for the interactive console

use owo_colors::OwoColorize;

use crate::prompt::ASSISTANT_NAME;

/// Formats console lines, with or without ANSI colors
#[derive(Debug, Clone, Copy)]
pub struct Console {
    pub colored: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    pub fn initializing(&self) -> String {
        let text = format!("{} AI Assistant Initializing...", ASSISTANT_NAME);
        if self.colored {
            format!("{}\n", text.green().bold())
        } else {
            format!("{}\n", text)
        }
    }

    /// Green progress line
    pub fn success(&self, message: &str) -> String {
        if self.colored {
            format!("{}\n", message.green())
        } else {
            format!("{}\n", message)
        }
    }

    pub fn info(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    pub fn welcome(&self) -> String {
        let greeting = format!(
            "Welcome. I'm {}. How can I help you today?",
            ASSISTANT_NAME
        );
        let hint = "Type 'exit' or 'quit' to end the session.";
        if self.colored {
            format!(
                "\n{}\n{}\n",
                greeting.cyan().bold(),
                hint.bright_black().italic()
            )
        } else {
            format!("\n{}\n{}\n", greeting, hint)
        }
    }

    pub fn user_prompt(&self) -> String {
        if self.colored {
            format!("{} ", "You:".yellow().bold())
        } else {
            "You: ".to_string()
        }
    }

    pub fn reply(&self, text: &str) -> String {
        let label = format!("{}:", ASSISTANT_NAME);
        if self.colored {
            format!("{} {}\n", label.yellow().bold(), text)
        } else {
            format!("{} {}\n", label, text)
        }
    }

    /// Dimmed status line about memory persistence
    pub fn note(&self, message: &str) -> String {
        if self.colored {
            format!("{}\n", message.bright_black().italic())
        } else {
            format!("{}\n", message)
        }
    }

    pub fn error(&self, message: &str) -> String {
        let text = format!("Error: {}", message);
        if self.colored {
            format!("{}\n", text.red().bold())
        } else {
            format!("{}\n", text)
        }
    }

    pub fn farewell(&self) -> String {
        if self.colored {
            format!("{}\n", "Goodbye!".green().bold())
        } else {
            "Goodbye!\n".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_has_no_escape_codes() {
        let console = Console::no_color();
        for line in [
            console.initializing(),
            console.welcome(),
            console.reply("hi"),
            console.error("boom"),
            console.farewell(),
        ] {
            assert!(!line.contains('\u{1b}'), "unexpected ANSI in {:?}", line);
        }
        assert_eq!(console.reply("hi"), "Vibe: hi\n");
        assert_eq!(console.error("boom"), "Error: boom\n");
    }

    #[test]
    fn colored_output_keeps_the_text() {
        let line = Console::new().reply("Nice to meet you, Sam!");
        assert!(line.contains('\u{1b}'));
        assert!(line.contains("Nice to meet you, Sam!"));
    }
}
