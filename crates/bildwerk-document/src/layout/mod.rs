// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout module: the pagination engine shared by every renderer.

pub mod paginate;

pub use paginate::{CAPTION_HEIGHT, ITEM_SPACING, caption_text, layout, page_count};
