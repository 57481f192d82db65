use serde::Serialize;
use similar::{Algorithm, ChangeTag, capture_diff_slices};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Unchanged,
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffSegment {
    pub text: String,
    pub kind: DiffKind,
}

impl DiffSegment {
    fn new(text: &str, kind: DiffKind) -> Self {
        Self {
            text: text.to_string(),
            kind,
        }
    }
}

/// Word-level alignment of `baseline` against `custom`, in reading order.
///
/// Words and whitespace runs are the tokens, aligned with Myers' O(ND)
/// algorithm so memory stays linear in the input. Within a change run the
/// removal is emitted before the addition, and neighbouring segments of one
/// kind are merged.
pub fn diff_words(baseline: &str, custom: &str) -> Vec<DiffSegment> {
    let old = tokenize(baseline);
    let new = tokenize(custom);

    let mut segments: Vec<DiffSegment> = Vec::new();
    let mut removed: Vec<&str> = Vec::new();
    let mut added: Vec<&str> = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, &old, &new) {
        for change in op.iter_changes(&old, &new) {
            match change.tag() {
                ChangeTag::Equal => {
                    flush_changes(&mut segments, &mut removed, &mut added);
                    push_segment(&mut segments, change.value(), DiffKind::Unchanged);
                }
                ChangeTag::Delete => removed.push(change.value()),
                ChangeTag::Insert => added.push(change.value()),
            }
        }
    }
    flush_changes(&mut segments, &mut removed, &mut added);
    segments
}

/// Inline rendering: `[-removed-]` and `{+added+}`.
pub fn render_markers(segments: &[DiffSegment]) -> String {
    let mut output = String::new();
    for segment in segments {
        match segment.kind {
            DiffKind::Unchanged => output.push_str(&segment.text),
            DiffKind::Removed => {
                output.push_str("[-");
                output.push_str(&segment.text);
                output.push_str("-]");
            }
            DiffKind::Added => {
                output.push_str("{+");
                output.push_str(&segment.text);
                output.push_str("+}");
            }
        }
    }
    output
}

pub fn has_changes(segments: &[DiffSegment]) -> bool {
    segments
        .iter()
        .any(|segment| segment.kind != DiffKind::Unchanged)
}

fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;
    for (index, ch) in text.char_indices() {
        let is_space = ch.is_whitespace();
        match in_space {
            Some(previous) if previous != is_space => {
                tokens.push(&text[start..index]);
                start = index;
            }
            _ => {}
        }
        in_space = Some(is_space);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

// A change run is written as all of its removals, then all of its additions.
fn flush_changes<'a>(
    segments: &mut Vec<DiffSegment>,
    removed: &mut Vec<&'a str>,
    added: &mut Vec<&'a str>,
) {
    for token in removed.drain(..) {
        push_segment(segments, token, DiffKind::Removed);
    }
    for token in added.drain(..) {
        push_segment(segments, token, DiffKind::Added);
    }
}

fn push_segment(segments: &mut Vec<DiffSegment>, token: &str, kind: DiffKind) {
    if let Some(last) = segments.last_mut()
        && last.kind == kind
    {
        last.text.push_str(token);
        return;
    }
    segments.push(DiffSegment::new(token, kind));
}
