//! Property-based tests for declaration invariants.

mod common;

use std::collections::BTreeSet;

use common::*;
use proptest::prelude::*;

use staticpage::components::static_page::{validate_name, validate_page_key};
use staticpage::components::StaticPageArgs;
use staticpage::policy::PolicyDocument;
use staticpage::resource::{PropertyValue, ResourceKind, ResourceUrn};
use staticpage::state::DiffEngine;

fn page_key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,8}(/[a-z][a-z0-9_-]{0,8}){0,2}\\.html"
}

fn page_set_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map(page_key_strategy(), "[ -~]{0,40}", 0..6).prop_map(|extra| {
        let mut pages = vec![("index.html".to_string(), "<h1>Home</h1>".to_string())];
        pages.extend(extra.into_iter().filter(|(k, _)| k != "index.html"));
        pages
    })
}

fn bucket_name_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9-]{2,40}[a-z0-9]"
}

proptest! {
    /// Every page becomes exactly one object holding its body
    #[test]
    fn test_every_page_declared_once(pages in page_set_strategy()) {
        let borrowed: Vec<(&str, &str)> =
            pages.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let (stack, page) = stack_with_pages("prop", &borrowed);

        prop_assert_eq!(stack.len(), 6 + pages.len() - 1);
        prop_assert_eq!(page.objects().len(), pages.len());

        let mut keys = BTreeSet::new();
        for object in page.objects() {
            let inputs = stack.resource(&object.urn).unwrap().input_properties();
            let key = inputs["key"].as_str().unwrap().to_string();
            let expected = pages.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str());
            prop_assert_eq!(inputs["content"].as_str(), expected);
            prop_assert!(stack.graph().depends_on(&object.urn, &page.bucket().urn));
            keys.insert(key);
        }
        prop_assert_eq!(keys.len(), pages.len());
    }

    /// The policy always follows the access block, never the reverse
    #[test]
    fn test_policy_ordering_holds(pages in page_set_strategy()) {
        let borrowed: Vec<(&str, &str)> =
            pages.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let (stack, page) = stack_with_pages("prop", &borrowed);

        let waves = stack.graph().execution_waves().unwrap();
        let wave_of = |urn: &ResourceUrn| waves.iter().position(|w| w.contains(urn)).unwrap();
        prop_assert!(wave_of(&page.access_block().urn) < wave_of(&page.policy().urn));
        prop_assert!(!stack.graph().depends_on(&page.access_block().urn, &page.policy().urn));
    }

    /// Declaring the same pages twice yields an empty diff
    #[test]
    fn test_redeclaration_is_idempotent(pages in page_set_strategy()) {
        let borrowed: Vec<(&str, &str)> =
            pages.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let first = stack_with_pages("prop", &borrowed).0.snapshot();
        let second = stack_with_pages("prop", &borrowed).0.snapshot();

        prop_assert!(DiffEngine::new().with_dependency_changes(true).diff(Some(&first), &second).is_empty());
    }

    /// Page key validation never panics, and accepted keys stay inside the bucket
    #[test]
    fn test_page_key_validation(key in "\\PC{0,24}") {
        if validate_page_key(&key).is_ok() {
            prop_assert!(!key.is_empty());
            prop_assert!(!key.starts_with('/'));
            prop_assert!(!key.split('/').any(|segment| segment == ".."));
        }
    }

    /// Generated keys are always accepted
    #[test]
    fn test_generated_keys_accepted(key in page_key_strategy()) {
        prop_assume!(key != "index.html");
        prop_assert!(validate_page_key(&key).is_ok());
        let args = StaticPageArgs::new().page("index.html", "x").page(key, "y");
        prop_assert!(args.validate("prop").is_ok());
    }

    /// Component names either validate or are rejected without panicking
    #[test]
    fn test_name_validation(name in "\\PC{0,16}") {
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        prop_assert_eq!(validate_name(&name).is_ok(), valid);
    }

    /// The public read policy parses back and grants reads on exactly its bucket
    #[test]
    fn test_public_read_policy(bucket in bucket_name_strategy()) {
        let document = PolicyDocument::public_read(&bucket);
        let parsed = PolicyDocument::parse(&document.to_json()).unwrap();
        prop_assert_eq!(&parsed, &document);
        prop_assert!(parsed.is_public());
        prop_assert!(parsed.allows_public_read(&bucket));
        let other = format!("{}-other", bucket);
        prop_assert!(!parsed.allows_public_read(&other));
    }
}

#[test]
fn test_bucket_inputs_are_computed_for_every_child() {
    let (stack, page) = hello_stack();
    for urn in [&page.website().urn, &page.objects()[0].urn, &page.policy().urn] {
        let inputs = stack.resource(urn).unwrap().input_properties();
        assert!(matches!(inputs["bucket"], PropertyValue::Computed { .. }));
    }
    assert_eq!(
        stack
            .resources_of_kind(&ResourceKind::BucketObject)
            .count(),
        1
    );
}
