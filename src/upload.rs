use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Upper bound on upload size, inclusive.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Declared mime types accepted for CSV uploads. Parquet files have
/// no registered mime type and are accepted by name suffix instead.
pub const ACCEPTED_MIME_TYPES: [&str; 3] = [
    "text/csv",
    "application/vnd.ms-excel",
    "application/octet-stream",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InvalidType,
    TooLarge,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::InvalidType => write!(f, "only CSV and Parquet files are allowed"),
            RejectReason::TooLarge => write!(f, "the file must be at most 10 MiB"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    IDLE,
    SELECTED,
    ACCEPTED,
    REJECTED(RejectReason),
    UPLOADING,
    SUCCEEDED,
    FAILED,
}

/// A locally selected, not-yet-confirmed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub path: PathBuf,
    pub file_name: String,
    pub mime: String,
    pub size: u64,
}

/// Pure acceptance rule over (name, declared mime, size). Type is
/// checked before size, like the reference; 10 MiB exactly passes,
/// one byte more does not.
pub fn validate(file_name: &str, mime: &str, size: u64) -> Result<(), RejectReason> {
    let type_ok = ACCEPTED_MIME_TYPES.contains(&mime) || file_name.ends_with(".parquet");
    if !type_ok {
        return Err(RejectReason::InvalidType);
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(RejectReason::TooLarge);
    }
    Ok(())
}

/// Best-effort declared mime for a local path. Browsers leave the
/// type empty for unknown extensions; so do we, which leaves parquet
/// to the suffix rule.
pub fn declared_mime(path: &Path) -> String {
    match path.extension().and_then(|s| s.to_str()) {
        Some("csv") => "text/csv".to_string(),
        Some("txt") => "text/plain".to_string(),
        _ => String::new(),
    }
}

/// The single upload slot: `IDLE -> SELECTED -> {ACCEPTED |
/// REJECTED} -> UPLOADING -> {SUCCEEDED | FAILED}`. Rejection
/// discards the candidate; failure retains it so the user can retry
/// without re-selecting. Nothing here retries on its own.
#[derive(Debug)]
pub struct UploadSlot {
    candidate: Option<UploadCandidate>,
    phase: UploadPhase,
}

impl Default for UploadSlot {
    fn default() -> Self {
        Self {
            candidate: None,
            phase: UploadPhase::IDLE,
        }
    }
}

impl UploadSlot {
    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    pub fn candidate(&self) -> Option<&UploadCandidate> {
        self.candidate.as_ref()
    }

    pub fn is_uploading(&self) -> bool {
        self.phase == UploadPhase::UPLOADING
    }

    /// Take a newly selected file. Ignored while a transfer is in
    /// flight; any earlier verdict is superseded.
    pub fn select(&mut self, candidate: UploadCandidate) {
        if self.is_uploading() {
            debug!("Ignoring file selection while uploading");
            return;
        }
        info!("Selected {} ({} bytes)", candidate.file_name, candidate.size);
        self.candidate = Some(candidate);
        self.phase = UploadPhase::SELECTED;
    }

    /// Run the acceptance rule on the selected candidate. On
    /// rejection the candidate is discarded and the reason returned
    /// for the user notification.
    pub fn validate(&mut self) -> Result<(), RejectReason> {
        let Some(candidate) = self.candidate.as_ref() else {
            return Ok(());
        };
        if self.phase != UploadPhase::SELECTED {
            return Ok(());
        }
        match validate(&candidate.file_name, &candidate.mime, candidate.size) {
            Ok(()) => {
                self.phase = UploadPhase::ACCEPTED;
                Ok(())
            }
            Err(reason) => {
                debug!("Rejected {}: {reason}", candidate.file_name);
                self.candidate = None;
                self.phase = UploadPhase::REJECTED(reason);
                Err(reason)
            }
        }
    }

    /// Move to UPLOADING on explicit user confirmation, handing the
    /// candidate to the transfer task. Only an accepted candidate or
    /// a failed one being retried may start; in particular a transfer
    /// already in flight blocks re-submission.
    pub fn begin(&mut self) -> Option<UploadCandidate> {
        match (self.phase, self.candidate.as_ref()) {
            (UploadPhase::ACCEPTED, Some(_)) | (UploadPhase::FAILED, Some(_)) => {
                self.phase = UploadPhase::UPLOADING;
                self.candidate.clone()
            }
            _ => None,
        }
    }

    /// Server acknowledged: the candidate is cleared.
    pub fn finish_ok(&mut self) {
        self.candidate = None;
        self.phase = UploadPhase::SUCCEEDED;
    }

    /// Transfer failed: keep the candidate for a user-initiated retry.
    pub fn finish_err(&mut self) {
        self.phase = UploadPhase::FAILED;
    }

    /// Explicit deselection.
    pub fn clear(&mut self) {
        if self.is_uploading() {
            return;
        }
        self.candidate = None;
        self.phase = UploadPhase::IDLE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, mime: &str, size: u64) -> UploadCandidate {
        UploadCandidate {
            path: PathBuf::from(name),
            file_name: name.to_string(),
            mime: mime.to_string(),
            size,
        }
    }

    #[test]
    fn size_boundary_is_inclusive() {
        assert_eq!(validate("big.csv", "text/csv", MAX_UPLOAD_BYTES), Ok(()));
        assert_eq!(
            validate("big.csv", "text/csv", MAX_UPLOAD_BYTES + 1),
            Err(RejectReason::TooLarge)
        );
    }

    #[test]
    fn parquet_accepted_by_suffix_regardless_of_mime() {
        assert_eq!(validate("data.parquet", "x-unknown/blob", 1024), Ok(()));
        assert_eq!(validate("data.parquet", "", 1024), Ok(()));
    }

    #[test]
    fn plain_text_is_rejected() {
        assert_eq!(
            validate("notes.txt", "text/plain", 10),
            Err(RejectReason::InvalidType)
        );
    }

    #[test]
    fn type_is_checked_before_size() {
        assert_eq!(
            validate("huge.txt", "text/plain", MAX_UPLOAD_BYTES + 1),
            Err(RejectReason::InvalidType)
        );
    }

    #[test]
    fn accepted_candidate_reaches_uploading_only_on_confirmation() {
        let mut slot = UploadSlot::default();
        slot.select(candidate("sales.csv", "text/csv", 2 * 1024 * 1024));
        assert_eq!(slot.phase(), UploadPhase::SELECTED);
        assert_eq!(slot.validate(), Ok(()));
        assert_eq!(slot.phase(), UploadPhase::ACCEPTED);

        let handed = slot.begin().unwrap();
        assert_eq!(handed.file_name, "sales.csv");
        assert_eq!(slot.phase(), UploadPhase::UPLOADING);
        // Re-submission is blocked while in flight.
        assert!(slot.begin().is_none());
    }

    #[test]
    fn rejection_discards_the_candidate() {
        let mut slot = UploadSlot::default();
        slot.select(candidate("notes.txt", "text/plain", 10));
        assert_eq!(slot.validate(), Err(RejectReason::InvalidType));
        assert_eq!(slot.phase(), UploadPhase::REJECTED(RejectReason::InvalidType));
        assert!(slot.candidate().is_none());
        assert!(slot.begin().is_none());
    }

    #[test]
    fn success_clears_failure_retains() {
        let mut slot = UploadSlot::default();
        slot.select(candidate("sales.csv", "text/csv", 100));
        slot.validate().unwrap();
        slot.begin().unwrap();

        slot.finish_err();
        assert_eq!(slot.phase(), UploadPhase::FAILED);
        assert!(slot.candidate().is_some(), "candidate kept for retry");

        // User-initiated retry from FAILED.
        assert!(slot.begin().is_some());
        slot.finish_ok();
        assert_eq!(slot.phase(), UploadPhase::SUCCEEDED);
        assert!(slot.candidate().is_none());
    }

    #[test]
    fn selection_is_ignored_mid_upload() {
        let mut slot = UploadSlot::default();
        slot.select(candidate("sales.csv", "text/csv", 100));
        slot.validate().unwrap();
        slot.begin().unwrap();

        slot.select(candidate("other.csv", "text/csv", 100));
        assert_eq!(slot.phase(), UploadPhase::UPLOADING);
        assert_eq!(slot.candidate().unwrap().file_name, "sales.csv");
    }

    #[test]
    fn declared_mime_follows_extension() {
        assert_eq!(declared_mime(Path::new("a.csv")), "text/csv");
        assert_eq!(declared_mime(Path::new("a.txt")), "text/plain");
        assert_eq!(declared_mime(Path::new("a.parquet")), "");
    }
}
