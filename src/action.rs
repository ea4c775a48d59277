//! Tool actions and the request payloads they submit.
//!
//! An [`Action`] carries only the action-specific parameters. It becomes an
//! [`ActionRequest`] once [`Action::bind`] attaches the `file_id` of the
//! active session, so a request can never point at a document other than
//! the one currently loaded.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

/// The kinds of task the service can run on an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    ExtractText,
    ExtractTextEnhanced,
    ExtractTextClean,
    ExtractTables,
    ExtractImages,
    RotatePages,
    DeletePages,
    Encrypt,
    Decrypt,
    ConvertToWord,
}

impl ActionKind {
    /// Endpoint path the action is submitted to.
    pub fn endpoint(self) -> &'static str {
        match self {
            ActionKind::ExtractText => "/extract-text",
            ActionKind::ExtractTextEnhanced => "/extract-text-enhanced",
            ActionKind::ExtractTextClean => "/extract-text-clean",
            ActionKind::ExtractTables => "/extract-tables",
            ActionKind::ExtractImages => "/extract-images",
            ActionKind::RotatePages => "/rotate-pages",
            ActionKind::DeletePages => "/delete-pages",
            ActionKind::Encrypt => "/encrypt",
            ActionKind::Decrypt => "/decrypt",
            ActionKind::ConvertToWord => "/convert-to-word",
        }
    }

    /// Verb shown next to the progress percentage, e.g. `Extracting text`.
    pub fn progress_label(self) -> &'static str {
        match self {
            ActionKind::ExtractText => "Extracting text",
            ActionKind::ExtractTextEnhanced => "Extracting text (layout preserved)",
            ActionKind::ExtractTextClean => "Extracting clean text",
            ActionKind::ExtractTables => "Extracting tables",
            ActionKind::ExtractImages => "Extracting images",
            ActionKind::RotatePages => "Rotating pages",
            ActionKind::DeletePages => "Deleting pages",
            ActionKind::Encrypt => "Encrypting",
            ActionKind::Decrypt => "Decrypting",
            ActionKind::ConvertToWord => "Converting to Word",
        }
    }

    /// Human-readable status line for a progress percentage.
    pub fn status_text(self, percent: u8) -> String {
        format!("{}… {}%", self.progress_label(), percent)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint().trim_start_matches('/'))
    }
}

/// A quarter-turn rotation accepted by `/rotate-pages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub enum Rotation {
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

impl TryFrom<i64> for Rotation {
    type Error = ValidationError;

    fn try_from(angle: i64) -> Result<Self, Self::Error> {
        match angle {
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            _ => Err(ValidationError::InvalidRotation { angle }),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(r: Rotation) -> u16 {
        r.degrees()
    }
}

/// A tool action with its parameters, not yet tied to a document.
///
/// Page numbers are 1-indexed. An empty page list means "all pages" for the
/// extraction and conversion actions.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ExtractText { pages: Vec<u32> },
    ExtractTextEnhanced { pages: Vec<u32> },
    ExtractTextClean { pages: Vec<u32> },
    ExtractTables { pages: Vec<u32> },
    ExtractImages {
        pages: Vec<u32>,
        export_path: Option<String>,
    },
    RotatePages { rotations: BTreeMap<u32, Rotation> },
    DeletePages { pages: Vec<u32> },
    Encrypt {
        user_password: String,
        owner_password: Option<String>,
    },
    Decrypt { password: String },
    ConvertToWord {
        pages: Vec<u32>,
        export_path: Option<String>,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::ExtractText { .. } => ActionKind::ExtractText,
            Action::ExtractTextEnhanced { .. } => ActionKind::ExtractTextEnhanced,
            Action::ExtractTextClean { .. } => ActionKind::ExtractTextClean,
            Action::ExtractTables { .. } => ActionKind::ExtractTables,
            Action::ExtractImages { .. } => ActionKind::ExtractImages,
            Action::RotatePages { .. } => ActionKind::RotatePages,
            Action::DeletePages { .. } => ActionKind::DeletePages,
            Action::Encrypt { .. } => ActionKind::Encrypt,
            Action::Decrypt { .. } => ActionKind::Decrypt,
            Action::ConvertToWord { .. } => ActionKind::ConvertToWord,
        }
    }

    /// Check the parameters against a document of `page_count` pages.
    ///
    /// Runs before anything is sent; every failure is a
    /// [`ValidationError`].
    pub fn validate(&self, page_count: u32) -> Result<(), ValidationError> {
        let check_pages = |pages: &[u32]| {
            pages.iter().try_for_each(|&page| {
                if page >= 1 && page <= page_count {
                    Ok(())
                } else {
                    Err(ValidationError::PageOutOfRange {
                        page,
                        total: page_count,
                    })
                }
            })
        };

        match self {
            Action::ExtractText { pages }
            | Action::ExtractTextEnhanced { pages }
            | Action::ExtractTextClean { pages }
            | Action::ExtractTables { pages }
            | Action::ExtractImages { pages, .. }
            | Action::ConvertToWord { pages, .. } => check_pages(pages),
            Action::DeletePages { pages } => {
                if pages.is_empty() {
                    return Err(ValidationError::EmptyPageList {
                        action: self.kind().to_string(),
                    });
                }
                check_pages(pages)
            }
            Action::RotatePages { rotations } => {
                if rotations.is_empty() {
                    return Err(ValidationError::EmptyPageList {
                        action: self.kind().to_string(),
                    });
                }
                let pages: Vec<u32> = rotations.keys().copied().collect();
                check_pages(&pages)
            }
            Action::Encrypt {
                user_password,
                owner_password,
            } => {
                if user_password.is_empty() {
                    return Err(ValidationError::EmptyPassword {
                        field: "user password",
                    });
                }
                if owner_password.as_deref() == Some("") {
                    return Err(ValidationError::EmptyPassword {
                        field: "owner password",
                    });
                }
                Ok(())
            }
            Action::Decrypt { password } => {
                if password.is_empty() {
                    return Err(ValidationError::EmptyPassword { field: "password" });
                }
                Ok(())
            }
        }
    }

    /// Attach the document this action will run against.
    pub fn bind(self, file_id: impl Into<String>) -> ActionRequest {
        ActionRequest {
            file_id: file_id.into(),
            action: self,
        }
    }
}

/// An [`Action`] bound to a concrete uploaded document.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub file_id: String,
    pub action: Action,
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    pub fn endpoint(&self) -> &'static str {
        self.kind().endpoint()
    }

    /// JSON body posted to [`Self::endpoint`].
    ///
    /// Pages are 1-based everywhere in this crate. The extraction and
    /// conversion endpoints index pages from 0, so their page lists are
    /// shifted down by one; `/delete-pages` and `/rotate-pages` take
    /// 1-based pages as-is.
    ///
    /// Blank export paths are sent as `null` so the service falls back to
    /// its "not saved" branch.
    pub fn body(&self) -> Value {
        let file_id = &self.file_id;
        match &self.action {
            Action::ExtractText { pages }
            | Action::ExtractTextEnhanced { pages }
            | Action::ExtractTextClean { pages }
            | Action::ExtractTables { pages } => {
                json!({ "file_id": file_id, "pages": zero_based(pages) })
            }
            Action::DeletePages { pages } => json!({ "file_id": file_id, "pages": pages }),
            Action::ExtractImages { pages, export_path }
            | Action::ConvertToWord { pages, export_path } => json!({
                "file_id": file_id,
                "pages": zero_based(pages),
                "export_path": non_blank(export_path),
            }),
            Action::RotatePages { rotations } => {
                let rotations: BTreeMap<String, u16> = rotations
                    .iter()
                    .map(|(page, r)| (page.to_string(), r.degrees()))
                    .collect();
                json!({ "file_id": file_id, "rotations": rotations })
            }
            Action::Encrypt {
                user_password,
                owner_password,
            } => json!({
                "file_id": file_id,
                "user_password": user_password,
                "owner_password": owner_password,
            }),
            Action::Decrypt { password } => json!({ "file_id": file_id, "password": password }),
        }
    }
}

fn zero_based(pages: &[u32]) -> Vec<u32> {
    pages.iter().map(|p| p.saturating_sub(1)).collect()
}

fn non_blank(path: &Option<String>) -> Option<&str> {
    path.as_deref().map(str::trim).filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_accepts_quarter_turns_only() {
        assert_eq!(Rotation::try_from(90).unwrap(), Rotation::Deg90);
        assert_eq!(Rotation::try_from(270).unwrap().degrees(), 270);
        assert_eq!(
            Rotation::try_from(45).unwrap_err(),
            ValidationError::InvalidRotation { angle: 45 }
        );
        assert!(Rotation::try_from(360).is_err());
    }

    #[test]
    fn rotate_body_uses_string_page_keys() {
        let req = Action::RotatePages {
            rotations: BTreeMap::from([(2, Rotation::Deg90), (5, Rotation::Deg180)]),
        }
        .bind("abc");
        assert_eq!(req.endpoint(), "/rotate-pages");
        assert_eq!(
            req.body(),
            json!({"file_id": "abc", "rotations": {"2": 90, "5": 180}})
        );
    }

    #[test]
    fn extraction_bodies_send_zero_based_pages() {
        let shifted = [
            Action::ExtractText { pages: vec![1, 3] },
            Action::ExtractTextEnhanced { pages: vec![1, 3] },
            Action::ExtractTextClean { pages: vec![1, 3] },
            Action::ExtractTables { pages: vec![1, 3] },
            Action::ExtractImages {
                pages: vec![1, 3],
                export_path: None,
            },
            Action::ConvertToWord {
                pages: vec![1, 3],
                export_path: None,
            },
        ];
        for action in shifted {
            let kind = action.kind();
            assert!(action.validate(3).is_ok());
            let body = action.bind("f").body();
            assert_eq!(body["pages"], json!([0, 2]), "{kind}");
        }

        let delete = Action::DeletePages { pages: vec![1, 3] }.bind("f");
        assert_eq!(delete.body(), json!({"file_id": "f", "pages": [1, 3]}));
    }

    #[test]
    fn empty_page_list_stays_empty() {
        let req = Action::ExtractText { pages: vec![] }.bind("f");
        assert_eq!(req.body(), json!({"file_id": "f", "pages": []}));
    }

    #[test]
    fn blank_export_path_is_sent_as_null() {
        let req = Action::ConvertToWord {
            pages: vec![],
            export_path: Some("   ".into()),
        }
        .bind("f1");
        assert_eq!(
            req.body(),
            json!({"file_id": "f1", "pages": [], "export_path": null})
        );
    }

    #[test]
    fn encrypt_body_carries_both_passwords() {
        let req = Action::Encrypt {
            user_password: "u".into(),
            owner_password: None,
        }
        .bind("f1");
        assert_eq!(
            req.body(),
            json!({"file_id": "f1", "user_password": "u", "owner_password": null})
        );
    }

    #[test]
    fn validate_rejects_pages_outside_document() {
        let a = Action::ExtractText { pages: vec![1, 4] };
        assert_eq!(
            a.validate(3).unwrap_err(),
            ValidationError::PageOutOfRange { page: 4, total: 3 }
        );
        assert!(Action::ExtractText { pages: vec![0] }.validate(3).is_err());
        assert!(a.validate(4).is_ok());
    }

    #[test]
    fn validate_requires_pages_for_destructive_actions() {
        let a = Action::DeletePages { pages: vec![] };
        assert!(matches!(
            a.validate(3),
            Err(ValidationError::EmptyPageList { .. })
        ));
        let r = Action::RotatePages {
            rotations: BTreeMap::new(),
        };
        assert!(r.validate(3).is_err());
    }

    #[test]
    fn validate_rejects_empty_passwords() {
        let d = Action::Decrypt {
            password: String::new(),
        };
        assert_eq!(
            d.validate(1).unwrap_err(),
            ValidationError::EmptyPassword { field: "password" }
        );
        let e = Action::Encrypt {
            user_password: "x".into(),
            owner_password: Some(String::new()),
        };
        assert!(e.validate(1).is_err());
    }

    #[test]
    fn status_text_formats_percentage() {
        assert_eq!(
            ActionKind::ExtractTables.status_text(40),
            "Extracting tables… 40%"
        );
        assert_eq!(ActionKind::ConvertToWord.to_string(), "convert-to-word");
    }
}
