use serde::Deserialize;
use serde::Serialize;

/// Submission descriptor handed in by the upstream caller (spec §6). The
/// transport that produces this value (HTTP/WebSocket job fetch) is out of
/// scope; this crate only defines the shape it arrives in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionDescriptor {
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: SubmissionKind,
    pub domain_id: String,
    pub pid: String,
    pub rid: String,
    pub lang: String,
    pub code: CodePayload,
    pub code_type: CodeKind,
    /// Comma-separated category list, already split by the transport.
    pub judge_category: Vec<String>,
    pub show_detail: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Submission = 0,
    Pretest = 1,
}

/// Encoding of the submitted code blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CodeKind {
    Text,
    Tar,
    Zip,
    Rar,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodePayload {
    /// `code_type = TEXT`: source verbatim.
    Inline(String),
    /// `code_type` is an archive kind: base64-encoded archive bytes.
    Archive(String),
}
