use std::time::Duration;

/// Inter-character delay used by the terminal reveal.
pub const PLAYBACK_DELAY: Duration = Duration::from_millis(15);

/// Cosmetic character-by-character reveal of an already-complete response.
/// The sink receives one grapheme-sized chunk per tick; `delay` is injectable
/// so tests run instantly. Reloading a past entry bypasses playback and the
/// caller prints the final text directly.
pub fn reveal(text: &str, delay: Duration, mut sink: impl FnMut(&str)) {
    for ch in text.chars() {
        let mut buf = [0u8; 4];
        sink(ch.encode_utf8(&mut buf));
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveal_delivers_full_text_in_order() {
        let mut collected = String::new();
        reveal("for i in range(10): ...", Duration::ZERO, |chunk| {
            collected.push_str(chunk)
        });
        assert_eq!(collected, "for i in range(10): ...");
    }

    #[test]
    fn reveal_handles_multibyte_characters() {
        let mut chunks = Vec::new();
        reveal("héllo ⚡", Duration::ZERO, |chunk| {
            chunks.push(chunk.to_string())
        });
        assert_eq!(chunks.concat(), "héllo ⚡");
        assert_eq!(chunks.len(), "héllo ⚡".chars().count());
    }

    #[test]
    fn reveal_of_empty_text_emits_nothing() {
        let mut called = false;
        reveal("", Duration::ZERO, |_| called = true);
        assert!(!called);
    }
}
