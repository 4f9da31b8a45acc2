use std::path::PathBuf;

use judge_protocol::submission::SubmissionDescriptor;
use serde::Deserialize;

/// One line of the daemon's stdin queue: a submission descriptor plus the
/// path to its already-fetched problem bundle on disk. Resolving `pid` to a
/// bundle path — and fetching/caching it over the network in the first
/// place — is the transport/cache layer this crate's spec explicitly
/// excludes (spec §1 Non-goals: "on-disk caching of problem packages");
/// this revision expects the caller to have already resolved it.
#[derive(Debug, Deserialize)]
pub struct QueuedSubmission {
    #[serde(flatten)]
    pub descriptor: SubmissionDescriptor,
    pub bundle_path: PathBuf,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn parses_a_text_submission_line() {
        let line = r#"{
            "tag": "t1",
            "type": 0,
            "domain_id": "d",
            "pid": "p1",
            "rid": "r1",
            "lang": "python",
            "code": "print(1)",
            "code_type": "TEXT",
            "judge_category": [],
            "show_detail": true,
            "bundle_path": "/tmp/p1.zip"
        }"#;
        let queued: QueuedSubmission = serde_json::from_str(line).unwrap();
        assert_eq!(queued.descriptor.tag, "t1");
        assert_eq!(queued.bundle_path, PathBuf::from("/tmp/p1.zip"));
    }
}
