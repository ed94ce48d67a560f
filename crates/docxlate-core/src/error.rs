// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core error types.

/// Errors raised while interpreting stream frames.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
	#[error("malformed stream message: {0}")]
	MalformedMessage(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
