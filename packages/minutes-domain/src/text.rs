use unicode_segmentation::UnicodeSegmentation;

const ELLIPSIS: &str = "...";

/// Truncates to at most `max` grapheme clusters, marking the cut with an ellipsis.
pub fn truncate_graphemes(text: &str, max: usize) -> String {
	let graphemes: Vec<&str> = text.graphemes(true).collect();

	if graphemes.len() <= max {
		return text.to_string();
	}
	if max <= ELLIPSIS.len() {
		return graphemes[..max].concat();
	}

	let mut out = graphemes[..max - ELLIPSIS.len()].concat().trim_end().to_string();

	out.push_str(ELLIPSIS);

	out
}

/// Collapses internal whitespace runs to single spaces.
pub fn squash_whitespace(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}
