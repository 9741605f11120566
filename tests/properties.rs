//! Property-based checks of validation and class inheritance.

use attribute_engine::error::{AttributeError, ValidationError};
use attribute_engine::model::{Attribute, AttributeType, AttributesClass, GroupPath};
use attribute_engine::schema::{AttributeValidator, EffectivePermissions};
use attribute_engine::syntax::SyntaxRegistry;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

fn attribute_with(count: usize) -> Attribute {
    Attribute::new(
        "T",
        "string",
        GroupPath::root(),
        (0..count).map(|i| format!("v{i}")),
    )
}

fn names_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(
        prop::sample::select(vec!["cn", "mail", "phone", "role", "perm", "title"]),
        0..4,
    )
    .prop_map(|names| names.into_iter().map(str::to_string).collect())
}

proptest! {
    #[test]
    fn cardinality_is_enforced(min in 0u32..4, extra in 0u32..4, count in 0usize..10) {
        let registry = SyntaxRegistry::with_defaults();
        let max = min + extra;
        let at = AttributeType::new("T", "string", min, max);
        let result = AttributeValidator::new(&registry).validate(&attribute_with(count), &at);

        if count < min as usize {
            let too_few = matches!(
                result,
                Err(AttributeError::SchemaValidation(ValidationError::TooFewValues { .. }))
            );
            prop_assert!(too_few);
        } else if count > max as usize {
            let too_many = matches!(
                result,
                Err(AttributeError::SchemaValidation(ValidationError::TooManyValues { .. }))
            );
            prop_assert!(too_many);
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn repeated_values_fail_uniqueness(count in 1usize..5, repeated in 0usize..5) {
        let registry = SyntaxRegistry::with_defaults();
        let at = AttributeType::new("T", "string", 0, 10).with_unique_values(true);
        let mut attribute = attribute_with(count);
        attribute.values.push(format!("v{}", repeated % count));

        let duplicated = matches!(
            AttributeValidator::new(&registry).validate(&attribute, &at),
            Err(AttributeError::SchemaValidation(ValidationError::DuplicatedValues { .. }))
        );
        prop_assert!(duplicated);
    }

    #[test]
    fn child_permissions_contain_parent_permissions(
        parent_allowed in names_strategy(),
        parent_mandatory in names_strategy(),
        child_allowed in names_strategy(),
        arbitrary in any::<bool>(),
    ) {
        let parent = AttributesClass::simple("parent", parent_allowed, parent_mandatory)
            .with_allow_arbitrary(arbitrary);
        let child = AttributesClass::simple("child", child_allowed, Vec::<String>::new())
            .with_parents(["parent"]);
        let known = HashMap::from([
            ("parent".to_string(), parent),
            ("child".to_string(), child),
        ]);

        let parent = EffectivePermissions::resolve(["parent"], &known).unwrap();
        let child = EffectivePermissions::resolve(["child"], &known).unwrap();
        prop_assert!(parent.allowed().is_subset(child.allowed()));
        prop_assert!(parent.mandatory().is_subset(child.mandatory()));
        prop_assert_eq!(child.allows_arbitrary(), arbitrary);
    }
}
