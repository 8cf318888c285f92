//! 草稿校验 - 业务能力层
//!
//! 表单框架校验的替身：只检查必填字段和几条跨字段规则

use serde::Serialize;
use serde_json::Value;

use crate::models::recjson::is_blank;
use crate::models::{AccessRight, Draft};

/// 单个字段的校验错误
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// 草稿校验
pub trait DraftValidator {
    /// 返回全部校验错误，空列表表示通过
    fn validate(&self, draft_id: &str, draft: &Draft) -> Vec<FieldError>;
}

/// 必填字段校验
#[derive(Debug, Clone)]
pub struct RequiredFieldsValidator {
    required: Vec<String>,
}

impl Default for RequiredFieldsValidator {
    fn default() -> Self {
        Self::new([
            "upload_type",
            "publication_date",
            "title",
            "creators",
            "description",
            "access_right",
        ])
    }
}

impl RequiredFieldsValidator {
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    fn is_missing(draft: &Draft, field: &str) -> bool {
        draft
            .get(field)
            .map(|v| is_blank(&v.to_json()))
            .unwrap_or(true)
    }
}

impl DraftValidator for RequiredFieldsValidator {
    fn validate(&self, _draft_id: &str, draft: &Draft) -> Vec<FieldError> {
        let mut errors: Vec<FieldError> = self
            .required
            .iter()
            .filter(|field| !draft.is_disabled(field))
            .filter(|field| Self::is_missing(draft, field))
            .map(|field| FieldError::new(field, "This field is required."))
            .collect();

        let access_right = draft
            .get("access_right")
            .map(|v| v.to_json())
            .and_then(|v| v.as_str().map(str::to_string));

        if let Some(value) = access_right {
            match value.parse::<AccessRight>() {
                Ok(AccessRight::Embargoed) if Self::is_missing(draft, "embargo_date") => {
                    errors.push(FieldError::new(
                        "embargo_date",
                        "Embargo date is required for embargoed uploads.",
                    ));
                }
                Ok(_) => {}
                Err(_) => errors.push(FieldError::new("access_right", "Not a valid choice.")),
            }
        }

        if let Some(creators) = draft.get("creators").map(|v| v.to_json()) {
            if !matches!(creators, Value::Array(_) | Value::Null) {
                errors.push(FieldError::new("creators", "Must be a list."));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete_draft() -> Draft {
        let mut draft = Draft::new();
        draft.set("upload_type", "dataset");
        draft.set("publication_date", "2014-02-27");
        draft.set("title", "Test");
        draft.set("creators", json!([{"name": "Doe, John"}]));
        draft.set("description", "Desc");
        draft.set("access_right", "open");
        draft
    }

    #[test]
    fn test_complete_draft_passes() {
        let validator = RequiredFieldsValidator::default();
        assert!(validator.validate("_default", &complete_draft()).is_empty());
    }

    #[test]
    fn test_missing_and_blank_fields_reported() {
        let validator = RequiredFieldsValidator::default();
        let mut draft = complete_draft();
        draft.set("title", "   ");
        draft.values.remove("description");

        let fields: Vec<String> = validator
            .validate("_default", &draft)
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(fields, vec!["title", "description"]);
    }

    #[test]
    fn test_embargo_requires_date() {
        let validator = RequiredFieldsValidator::default();
        let mut draft = complete_draft();
        draft.set("access_right", "embargoed");

        let errors = validator.validate("_default", &draft);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "embargo_date");
    }
}
