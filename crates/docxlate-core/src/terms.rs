// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Normalisation of the free-text "keep these terms untranslated" list.

/// Splits user input on line breaks and commas, trimming and dropping empties.
pub fn parse_retain_terms(raw: &str) -> Vec<String> {
	raw.split(['\n', '\r', ','])
		.map(str::trim)
		.filter(|term| !term.is_empty())
		.map(str::to_string)
		.collect()
}

/// The upload form field value: one term per line, or `None` when empty.
pub fn join_retain_terms(raw: &str) -> Option<String> {
	let terms = parse_retain_terms(raw);
	if terms.is_empty() {
		None
	} else {
		Some(terms.join("\n"))
	}
}
