// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-English error messages for notifications.
//
// Every technical error maps to a short message and a suggestion. The
// severity drives which notification level a front end uses.

use crate::error::BildwerkError;
use crate::notify::NotificationLevel;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Only one image was affected; the rest of the batch carried on.
    ItemSkipped,
    /// The user must change something (pick files, fix a setting).
    ActionRequired,
    /// Retrying the same input will not help.
    Permanent,
    /// Something outside the user's control; trying again may work.
    Transient,
}

impl Severity {
    pub fn notification_level(&self) -> NotificationLevel {
        match self {
            Self::ItemSkipped | Self::ActionRequired => NotificationLevel::Warning,
            Self::Permanent | Self::Transient => NotificationLevel::Error,
        }
    }
}

/// A human-readable error with message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    pub suggestion: String,
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    /// Message and suggestion joined into one line.
    pub fn line(&self) -> String {
        format!("{} {}", self.message, self.suggestion)
    }
}

/// Convert a `BildwerkError` into a `HumanError`.
pub fn humanize_error(err: &BildwerkError) -> HumanError {
    match err {
        BildwerkError::Decode(_) => HumanError {
            message: "One image couldn't be read.".into(),
            suggestion: "It may be damaged. Try saving it again as a JPEG or PNG.".into(),
            retriable: false,
            severity: Severity::ItemSkipped,
        },

        BildwerkError::Encode(_) => HumanError {
            message: "One image couldn't be compressed.".into(),
            suggestion: "It was left out of the batch. Try a smaller copy of the image.".into(),
            retriable: false,
            severity: Severity::ItemSkipped,
        },

        BildwerkError::InvalidInputFormat(detail) => HumanError {
            message: "This file isn't a supported image.".into(),
            suggestion: format!("Use JPEG, PNG, GIF or BMP files. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        BildwerkError::InvalidDimensions(_) => HumanError {
            message: "An image has an impossible size.".into(),
            suggestion: "The file reports zero width or height. Try re-saving it.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        BildwerkError::InvalidOptions(detail) | BildwerkError::Config(detail) => HumanError {
            message: "A setting is out of range.".into(),
            suggestion: format!("Check the export settings and try again. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        // Callers never see these; the pipeline compresses inline instead.
        BildwerkError::WorkerUnavailable(_) | BildwerkError::WorkerTransferFailed(_) => {
            HumanError {
                message: "Background compression stopped.".into(),
                suggestion: "Images will be compressed more slowly. Nothing needs doing.".into(),
                retriable: true,
                severity: Severity::Transient,
            }
        }

        BildwerkError::Render(_) => HumanError {
            message: "The document couldn't be created.".into(),
            suggestion: "Try again. If it keeps failing, try the other document format.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        BildwerkError::NothingToExport => HumanError {
            message: "There are no images to export.".into(),
            suggestion: "Add some images first, then export again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        BildwerkError::Cancelled => HumanError {
            message: "The export was cancelled.".into(),
            suggestion: "Start it again whenever you're ready.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        BildwerkError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError {
                message: "The file couldn't be found.".into(),
                suggestion: "It may have been moved or deleted. Try choosing the file again."
                    .into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            std::io::ErrorKind::PermissionDenied => HumanError {
                message: "Bildwerk doesn't have permission to use that file.".into(),
                suggestion: "Check the file permissions or pick another folder.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            _ => HumanError {
                message: "There was a problem reading or writing a file.".into(),
                suggestion: "Try again. If this keeps happening, the disk may be full.".into(),
                retriable: true,
                severity: Severity::Transient,
            },
        },

        BildwerkError::Serialization(_) => HumanError {
            message: "The settings file couldn't be read.".into(),
            suggestion: "Check that it is valid JSON, or delete it to use the defaults.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
    }
}
