//! Text clean-up before handing it to a speech engine.
//!
//! Engines either skip pictographs or read out their Unicode names ("party
//! popper"), neither of which helps someone listening to a dosage summary.

fn is_pictograph(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF // emoticons, pictographs, transport, flags, supplemental
            | 0x2300..=0x23FF // misc technical (watch, hourglass, ...)
            | 0x2600..=0x27BF // misc symbols, dingbats
            | 0x2B00..=0x2BFF // arrows, stars
            | 0xFE0E..=0xFE0F // variation selectors
            | 0x200D // zero width joiner
            | 0x20E3 // combining enclosing keycap
            | 0xE0020..=0xE007F // tag sequences
    )
}

/// Strips emoji and pictographs, collapses whitespace and trims.
pub fn sanitize_for_speech(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars().filter(|c| !is_pictograph(*c)) {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }
    out
}
