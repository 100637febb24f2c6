use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const ID_BYTES: usize = 16;

/// Title given to a document saved before the user named it.
pub const UNTITLED: &str = "New Shader";

/// A saved shader document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub code: String,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the caller when creating a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShader {
    pub title: String,
    pub description: String,
    pub code: String,
    pub is_public: bool,
}

impl NewShader {
    pub fn new(title: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            code: code.into(),
            is_public: false,
        }
    }

    /// Returns every rule the fields break; empty means the input is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = validate_code(&self.code);
        let title_chars = self.title.trim().chars().count();
        if title_chars == 0 {
            issues.insert(0, "title is required".to_string());
        } else if self.title.chars().count() > TITLE_MAX_CHARS {
            issues.insert(
                0,
                format!("title must be at most {TITLE_MAX_CHARS} characters"),
            );
        }
        if self.description.chars().count() > DESCRIPTION_MAX_CHARS {
            issues.push(format!(
                "description must be at most {DESCRIPTION_MAX_CHARS} characters"
            ));
        }
        issues
    }
}

pub(crate) fn validate_code(code: &str) -> Vec<String> {
    if code.trim().is_empty() {
        vec!["code is required".to_string()]
    } else {
        Vec::new()
    }
}

/// 32 lowercase hex characters from 16 random bytes.
pub fn generate_id() -> String {
    let bytes: [u8; ID_BYTES] = rand::thread_rng().gen();
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Accepts only ids shaped like [`generate_id`] output, which keeps them safe
/// to use as file names.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_BYTES * 2
        && id
            .bytes()
            .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte))
}
