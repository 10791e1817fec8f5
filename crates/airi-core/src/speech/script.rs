//! Speech-text preparation.
//!
//! Strips the parts of a response that should not be spoken aloud while
//! keeping the character's voice: fenced code blocks go entirely, stage
//! directions lose their asterisks but keep the action text, decorations
//! are dropped, and whitespace is collapsed to single spaces.

/// Prepare a sentence for the synthesizer.
pub fn speech_script(text: &str) -> String {
    let text = strip_fenced_blocks(text);
    let text = unwrap_stage_directions(&text);
    let text = text.replace('~', "").replace('\u{1F496}', "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove every ```fenced``` block, fence markers included. An unmatched
/// opening fence is left alone.
fn strip_fenced_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        match rest[open + 3..].find("```") {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + 3 + close + 3..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Turn `*action*` into `action`. An unmatched asterisk is left alone.
fn unwrap_stage_directions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('*') {
        match rest[open + 1..].find('*') {
            Some(close) => {
                out.push_str(&rest[..open]);
                out.push_str(&rest[open + 1..open + 1 + close]);
                rest = &rest[open + 1 + close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}
