//! Extraction of `[SAVE_MEMORY]...[/SAVE_MEMORY]` blocks from model output
//!
//! Scanning is left to right. Each opening marker pairs with the nearest
//! closing marker after it, provided no other opening marker and no line
//! break come first; otherwise the opening marker is unterminated and is
//! left in the display text as-is. Paired blocks are removed from the
//! display text and their inner text becomes a fact, in order of
//! appearance, duplicates included.

/// Opening and closing fact markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPair {
    pub open: &'static str,
    pub close: &'static str,
}

impl MarkerPair {
    pub const fn new(open: &'static str, close: &'static str) -> Self {
        Self { open, close }
    }
}

/// The markers the system instructions teach the model to emit
pub const SAVE_MEMORY: MarkerPair = MarkerPair::new("[SAVE_MEMORY]", "[/SAVE_MEMORY]");

/// Result of scanning one response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extraction {
    /// Response with every paired block removed, trimmed
    pub display_text: String,
    /// Inner text of each paired block, untrimmed
    pub new_facts: Vec<String>,
}

/// Extract `[SAVE_MEMORY]` facts
pub fn extract(response_text: &str) -> Extraction {
    extract_with(SAVE_MEMORY, response_text)
}

/// Extract facts delimited by `markers`
pub fn extract_with(markers: MarkerPair, response_text: &str) -> Extraction {
    let text = response_text;
    let mut display = String::with_capacity(text.len());
    let mut new_facts = Vec::new();
    let mut pos = 0;

    while let Some(found) = text[pos..].find(markers.open) {
        let start = pos + found;
        let inner_start = start + markers.open.len();
        let rest = &text[inner_start..];

        let close = rest.find(markers.close);
        let blocked_at = [rest.find(markers.open), rest.find('\n')]
            .into_iter()
            .flatten()
            .min();

        match close {
            Some(close) if blocked_at.map_or(true, |b| close <= b) => {
                display.push_str(&text[pos..start]);
                new_facts.push(rest[..close].to_string());
                pos = inner_start + close + markers.close.len();
            }
            _ => {
                // Unterminated: keep the marker, resume scanning after it
                display.push_str(&text[pos..inner_start]);
                pos = inner_start;
            }
        }
    }
    display.push_str(&text[pos..]);

    Extraction {
        display_text: display.trim().to_string(),
        new_facts,
    }
}
