//! Voice-command grammar.
//!
//! The speech-to-text step happens outside this service; what arrives here
//! is transcribed text. The grammar recognizes Vietnamese ("cho ăn 200
//! gram") and English ("feed 200 grams") trigger phrases with an optional
//! amount.

use pawfeed_core::{amount_in_range, MAX_FEED_AMOUNT, MIN_FEED_AMOUNT};
use regex::Regex;

/// Grams dispensed when the command names no amount.
pub const DEFAULT_VOICE_AMOUNT: u32 = 50;

/// Why a text was not accepted as a feed command.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum VoiceParseError {
    #[error(
        "Không tìm thấy cụm từ kích hoạt trong lệnh. Tiếng Việt: 'cho ăn', \
         Tiếng Anh: 'feed' (ví dụ: 'cho ăn 200 gram' hoặc 'feed 200 grams')"
    )]
    NoTrigger,

    #[error("Số lượng phải từ {MIN_FEED_AMOUNT} đến {MAX_FEED_AMOUNT} gram")]
    AmountOutOfRange,
}

/// A recognized feed instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeed {
    pub amount: u32,
}

/// Compiled voice grammar.
pub struct VoiceParser {
    vi_trigger: Regex,
    en_trigger: Regex,
    amount: Regex,
}

impl Default for VoiceParser {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceParser {
    pub fn new() -> Self {
        Self {
            vi_trigger: Regex::new(r"cho\s*ăn|cho\s*an").expect("static regex"),
            en_trigger: Regex::new(r"feed|give\s+food|dispense").expect("static regex"),
            amount: Regex::new(r"(\d+)\s*(?:grams|gram|gr|g)\b").expect("static regex"),
        }
    }

    /// Parse a transcribed command.
    pub fn parse(&self, text: &str) -> Result<ParsedFeed, VoiceParseError> {
        let normalized = text.trim().to_lowercase();

        if !self.vi_trigger.is_match(&normalized) && !self.en_trigger.is_match(&normalized) {
            return Err(VoiceParseError::NoTrigger);
        }

        let amount = match self.amount.captures(&normalized) {
            Some(captures) => {
                // Absurdly long digit runs fall back to the default, the same
                // way unparseable amounts did in the original grammar.
                let parsed = captures[1].parse::<u32>().ok();
                match parsed {
                    Some(0) | None => DEFAULT_VOICE_AMOUNT,
                    Some(amount) if !amount_in_range(amount) => {
                        return Err(VoiceParseError::AmountOutOfRange)
                    }
                    Some(amount) => amount,
                }
            }
            None => DEFAULT_VOICE_AMOUNT,
        };

        Ok(ParsedFeed { amount })
    }
}
