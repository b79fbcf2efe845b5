// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keystroke primitives sent to a pane: literal text, named keys (arrows,
//! control sequences), and inter-keystroke delays.

use std::time::Duration;

/// One keystroke send: raw bytes, optionally followed by a settle delay
/// before the next keystroke in the same batch is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keystroke {
    pub bytes: Vec<u8>,
    pub delay_after: Option<Duration>,
}

impl Keystroke {
    pub fn text(s: impl Into<String>) -> Self {
        Self { bytes: s.into().into_bytes(), delay_after: None }
    }

    pub fn named(name: &str) -> Option<Self> {
        encode_key(name).map(|bytes| Self { bytes, delay_after: None })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_after = Some(delay);
        self
    }

    /// Infallible shorthand for the always-present `enter` key, used by
    /// callers that compose fixed keystroke sequences and have no fallback
    /// path for a named key that can't fail to resolve.
    pub fn enter() -> Self {
        Self { bytes: b"\r".to_vec(), delay_after: None }
    }

    /// Infallible shorthand for `ctrl-c`, see [`Keystroke::enter`].
    pub fn ctrl_c() -> Self {
        Self { bytes: vec![0x03], delay_after: None }
    }

    /// Infallible shorthand for `down`, see [`Keystroke::enter`].
    pub fn down() -> Self {
        Self { bytes: b"\x1b[B".to_vec(), delay_after: None }
    }
}

/// Translate a named key to its terminal escape sequence (case-insensitive).
pub fn encode_key(name: &str) -> Option<Vec<u8>> {
    let lower = name.to_lowercase();
    let bytes: &[u8] = match lower.as_str() {
        "enter" | "return" => b"\r",
        "tab" => b"\t",
        "escape" | "esc" => b"\x1b",
        "backspace" => b"\x7f",
        "up" => b"\x1b[A",
        "down" => b"\x1b[B",
        "right" => b"\x1b[C",
        "left" => b"\x1b[D",
        "space" => b" ",
        _ => {
            if let Some(ch_str) = lower.strip_prefix("ctrl-") {
                let ch = ch_str.chars().next()?;
                if ch.is_ascii_lowercase() {
                    let ctrl = (ch.to_ascii_uppercase() as u8).wrapping_sub(b'@');
                    return Some(vec![ctrl]);
                }
            }
            return None;
        }
    };
    Some(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        enter = { "enter", Some(&b"\r"[..]) },
        return_alias = { "return", Some(&b"\r"[..]) },
        escape = { "escape", Some(&b"\x1b"[..]) },
        esc_alias = { "Esc", Some(&b"\x1b"[..]) },
        up = { "up", Some(&b"\x1b[A"[..]) },
        ctrl_c = { "ctrl-c", Some(&[0x03][..]) },
        unknown = { "not-a-key", None },
    )]
    fn encode_key_cases(name: &str, expected: Option<&[u8]>) {
        assert_eq!(encode_key(name).as_deref(), expected);
    }
}
