//! Bucket policy documents
//!
//! The field names and their order are what the storage provider's policy
//! evaluator expects, so they are spelled out with serde renames instead of
//! being derived from Rust naming.

use serde::{Deserialize, Serialize};

use crate::resource::s3::bucket_arn;

/// Policy language version understood by the provider.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Action that reads an object.
pub const GET_OBJECT_ACTION: &str = "s3:GetObject";

/// A policy value that may be a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    /// A single value
    One(String),
    /// Several values
    Many(Vec<String>),
}

impl OneOrMany {
    /// Whether `value` is one of the entries.
    pub fn contains(&self, value: &str) -> bool {
        match self {
            OneOrMany::One(v) => v == value,
            OneOrMany::Many(values) => values.iter().any(|v| v == value),
        }
    }

    /// Iterate over the entries.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: Vec<&str> = match self {
            OneOrMany::One(v) => vec![v.as_str()],
            OneOrMany::Many(values) => values.iter().map(String::as_str).collect(),
        };
        items.into_iter()
    }
}

/// Allow or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Grant the actions
    Allow,
    /// Refuse the actions
    Deny,
}

/// One statement of a policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Allow or deny
    #[serde(rename = "Effect")]
    pub effect: Effect,
    /// Who the statement applies to; `*` means anyone
    #[serde(rename = "Principal")]
    pub principal: OneOrMany,
    /// Actions covered
    #[serde(rename = "Action")]
    pub action: OneOrMany,
    /// Resource ARNs covered
    #[serde(rename = "Resource")]
    pub resource: OneOrMany,
}

/// A bucket policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Policy language version
    #[serde(rename = "Version")]
    pub version: String,
    /// Statements
    #[serde(rename = "Statement")]
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    /// A policy letting anyone read every object of `bucket_name`.
    pub fn public_read(bucket_name: &str) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: vec![Statement {
                effect: Effect::Allow,
                principal: OneOrMany::One("*".to_string()),
                action: OneOrMany::One(GET_OBJECT_ACTION.to_string()),
                resource: OneOrMany::Many(vec![format!("{}/*", bucket_arn(bucket_name))]),
            }],
        }
    }

    /// Parse a JSON policy document.
    pub fn parse(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Render as compact JSON.
    pub fn to_json(&self) -> String {
        // Only strings and enums are serialized, which cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Whether any statement grants anonymous access.
    pub fn is_public(&self) -> bool {
        self.statement
            .iter()
            .any(|s| s.effect == Effect::Allow && s.principal.contains("*"))
    }

    /// Whether anyone may read objects of `bucket_name`.
    pub fn allows_public_read(&self, bucket_name: &str) -> bool {
        let wildcard = format!("{}/*", bucket_arn(bucket_name));
        self.statement.iter().any(|s| {
            s.effect == Effect::Allow
                && s.principal.contains("*")
                && (s.action.contains(GET_OBJECT_ACTION) || s.action.contains("s3:*"))
                && s.resource.contains(&wildcard)
        })
    }
}

/// Policy JSON granting anonymous `s3:GetObject` on every object of the bucket.
pub fn public_read_policy(bucket_name: &str) -> String {
    PolicyDocument::public_read(bucket_name).to_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_public_read_policy_verbatim() {
        let json = public_read_policy("demo-1234567");
        assert_eq!(
            json,
            r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Principal":"*","Action":"s3:GetObject","Resource":["arn:aws:s3:::demo-1234567/*"]}]}"#
        );
    }

    #[test]
    fn test_policy_parse_list_action() {
        let json = r#"{
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Principal": "*",
                "Action": ["s3:GetObject"],
                "Resource": ["arn:aws:s3:::site/*"]
            }]
        }"#;
        let doc = PolicyDocument::parse(json).unwrap();
        assert!(doc.is_public());
        assert!(doc.allows_public_read("site"));
        assert!(!doc.allows_public_read("other"));
    }

    #[test]
    fn test_deny_is_not_public() {
        let mut doc = PolicyDocument::public_read("site");
        doc.statement[0].effect = Effect::Deny;
        assert!(!doc.is_public());
        assert!(!doc.allows_public_read("site"));
    }

    #[test]
    fn test_one_or_many_iter() {
        let many = OneOrMany::Many(vec!["a".into(), "b".into()]);
        assert_eq!(many.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(OneOrMany::One("*".into()).contains("*"));
    }
}
