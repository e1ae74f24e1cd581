//! References and citation renumbering.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Inline citation placeholder, `[n]`.
static CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("citation pattern is valid"));

/// A source cited by a task's message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reference {
    /// Citation number; local to the emitting task until published.
    pub sequence_number: u32,
    /// Reference id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Source kind (e.g. `web`, `document`).
    pub source: String,
    /// Id within the source.
    pub source_id: String,
    /// Link, if any.
    pub url: String,
}

impl Reference {
    /// Reference with a number, id, and name; other fields empty.
    pub fn new(sequence_number: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            sequence_number,
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the source kind and source id.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>, source_id: impl Into<String>) -> Self {
        self.source = source.into();
        self.source_id = source_id.into();
        self
    }

    /// Set the link.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// One message and the references its placeholders resolve against.
#[derive(Clone, Copy, Debug)]
pub struct CitedText<'a> {
    /// Message text.
    pub text: &'a str,
    /// References local to the message.
    pub references: &'a [Reference],
    /// Whether the text is published (invisible entries only contribute references).
    pub visible: bool,
}

/// Result of [`renumber_citations`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Renumbered {
    /// Rewritten text of each visible input, in input order.
    pub texts: Vec<String>,
    /// Every input reference with its published number, ordered by number.
    pub references: Vec<Reference>,
}

/// Renumber citations across several messages.
///
/// Placeholders are scanned left to right over the visible texts. Each
/// distinct reference gets `offset + k` on its first citation, where `k`
/// counts references numbered so far, and all its placeholders become
/// `<sup>N</sup>`. References never cited follow in input order. Placeholders
/// with no matching reference are left as written. Inputs are not modified.
pub fn renumber_citations(inputs: &[CitedText<'_>], offset: u32) -> Renumbered {
    let mut assigned: HashMap<(usize, usize), u32> = HashMap::new();
    let mut references: Vec<Reference> = Vec::new();

    let mut assign = |entry: usize, pos: usize, reference: &Reference| -> u32 {
        *assigned.entry((entry, pos)).or_insert_with(|| {
            let assigned_so_far = u32::try_from(references.len()).unwrap_or(u32::MAX);
            let number = offset.saturating_add(assigned_so_far);
            references.push(Reference {
                sequence_number: number,
                ..reference.clone()
            });
            number
        })
    };

    let mut texts = Vec::new();
    for (entry, input) in inputs.iter().enumerate().filter(|(_, i)| i.visible) {
        let rewritten = CITATION.replace_all(input.text, |caps: &Captures<'_>| {
            let found = caps[1].parse::<u32>().ok().and_then(|n| {
                input
                    .references
                    .iter()
                    .position(|r| r.sequence_number == n)
            });
            match found {
                Some(pos) => format!("<sup>{}</sup>", assign(entry, pos, &input.references[pos])),
                None => caps[0].to_owned(),
            }
        });
        texts.push(rewritten.into_owned());
    }

    for (entry, input) in inputs.iter().enumerate() {
        for (pos, reference) in input.references.iter().enumerate() {
            let _ = assign(entry, pos, reference);
        }
    }

    Renumbered { texts, references }
}
