//! Tests for statement evaluation.

use super::{
    AttributeMap, EffectiveAttributesEvaluator, EntitySnapshot, SchemaSnapshot, validate_statements,
};
use crate::error::ValidationError;
use crate::expression::BuiltinExpressionEngine;
use crate::model::{
    Attribute, AttributeExt, AttributeStatement, AttributeType, AttributesClass, ConflictResolution,
    Group, GroupPath, Identity, UNLIMITED_ELEMENTS,
};
use crate::syntax::SyntaxRegistry;
use std::collections::{BTreeSet, HashMap};

fn path(p: &str) -> GroupPath {
    GroupPath::new(p).unwrap()
}

fn string_attr(name: &str, group: &str, values: &[&str]) -> Attribute {
    Attribute::new(name, "string", path(group), values.iter().copied())
}

/// Owned data behind one evaluation.
struct Fixture {
    groups: Vec<Group>,
    types: Vec<AttributeType>,
    identities: Vec<Identity>,
    membership: BTreeSet<GroupPath>,
    direct: HashMap<GroupPath, AttributeMap>,
    classes: HashMap<String, AttributesClass>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            groups: vec![Group::new(GroupPath::root())],
            types: vec![
                AttributeType::new("role", "string", 0, 1),
                AttributeType::new("perm", "string", 0, 1),
                AttributeType::new("tags", "string", 0, UNLIMITED_ELEMENTS),
                AttributeType::new("level", "integer", 0, 1),
                AttributeType::new("x", "string", 0, 1),
                AttributeType::new("y", "string", 0, 1),
                AttributeType::new("z", "string", 0, 1),
                AttributeType::new("sys:AttributeClasses", "string", 0, UNLIMITED_ELEMENTS),
            ],
            identities: vec![
                Identity::new("userName", "alice", 7),
                Identity::new("email", "alice@example.com", 7),
            ],
            membership: BTreeSet::from([GroupPath::root()]),
            direct: HashMap::new(),
            classes: HashMap::new(),
        }
    }

    fn group(mut self, group: Group) -> Self {
        self.membership.insert(group.path.clone());
        self.groups.retain(|g| g.path != group.path);
        self.groups.push(group);
        self
    }

    fn statement(mut self, group: &str, statement: AttributeStatement) -> Self {
        let group_path = path(group);
        match self.groups.iter_mut().find(|g| g.path == group_path) {
            Some(existing) => existing.attribute_statements.push(statement),
            None => {
                self.membership.insert(group_path.clone());
                self.groups.push(Group::new(group_path).with_statement(statement));
            }
        }
        self
    }

    fn attribute_type(mut self, at: AttributeType) -> Self {
        self.types.retain(|t| t.name != at.name);
        self.types.push(at);
        self
    }

    fn direct(mut self, attribute: Attribute) -> Self {
        self.membership.insert(attribute.group_path.clone());
        self.direct
            .entry(attribute.group_path.clone())
            .or_default()
            .insert(attribute.name.clone(), AttributeExt::direct(attribute));
        self
    }

    fn class(mut self, class: AttributesClass) -> Self {
        self.classes.insert(class.name.clone(), class);
        self
    }

    fn evaluate(&self, group: &str, queried: Option<&str>) -> AttributeMap {
        let snapshot = SchemaSnapshot::new(self.groups.clone(), self.types.clone());
        let syntaxes = SyntaxRegistry::with_defaults();
        let engine = BuiltinExpressionEngine::new();
        let entity = EntitySnapshot {
            identities: &self.identities,
            groups: &self.membership,
            direct_attributes: &self.direct,
            known_classes: &self.classes,
        };
        EffectiveAttributesEvaluator::new(&syntaxes, &engine, &snapshot, entity)
            .get_effective_attributes(&path(group), queried)
    }
}

fn values(map: &AttributeMap, name: &str) -> Vec<String> {
    map.get(name)
        .map(|a| a.values().to_vec())
        .unwrap_or_default()
}

#[test]
fn test_fixed_statement_applied_when_condition_holds() {
    let fixture = Fixture::new()
        .direct(string_attr("role", "/", &["admin"]))
        .statement(
            "/",
            AttributeStatement::fixed(
                "attr['role'] == 'admin'",
                None,
                ConflictResolution::Skip,
                string_attr("perm", "/", &["full"]),
            ),
        );

    let effective = fixture.evaluate("/", None);
    assert_eq!(values(&effective, "perm"), vec!["full"]);
    assert!(!effective["perm"].direct);
    assert!(effective["role"].direct);

    let other = Fixture::new()
        .direct(string_attr("role", "/", &["user"]))
        .statement(
            "/",
            AttributeStatement::fixed(
                "attr['role'] == 'admin'",
                None,
                ConflictResolution::Skip,
                string_attr("perm", "/", &["full"]),
            ),
        );
    assert!(!other.evaluate("/", None).contains_key("perm"));
}

#[test]
fn test_skip_keeps_existing_attribute() {
    let fixture = Fixture::new()
        .direct(string_attr("perm", "/", &["none"]))
        .statement(
            "/",
            AttributeStatement::fixed("true", None, ConflictResolution::Skip, string_attr("perm", "/", &["full"])),
        );

    let effective = fixture.evaluate("/", None);
    assert_eq!(values(&effective, "perm"), vec!["none"]);
    assert!(effective["perm"].direct);
}

#[test]
fn test_overwrite_replaces_only_derived_attributes() {
    let derived = Fixture::new()
        .statement(
            "/",
            AttributeStatement::fixed("true", None, ConflictResolution::Skip, string_attr("perm", "/", &["read"])),
        )
        .statement(
            "/",
            AttributeStatement::fixed("true", None, ConflictResolution::Overwrite, string_attr("perm", "/", &["write"])),
        );
    assert_eq!(values(&derived.evaluate("/", None), "perm"), vec!["write"]);

    let direct = Fixture::new()
        .direct(string_attr("perm", "/", &["read"]))
        .statement(
            "/",
            AttributeStatement::fixed("true", None, ConflictResolution::Overwrite, string_attr("perm", "/", &["write"])),
        );
    let effective = direct.evaluate("/", None);
    assert_eq!(values(&effective, "perm"), vec!["read"]);
    assert!(effective["perm"].direct);
}

#[test]
fn test_merge_requires_unlimited_type() {
    let fixture = Fixture::new()
        .direct(string_attr("tags", "/", &["a"]))
        .direct(string_attr("perm", "/", &["read"]))
        .statement(
            "/",
            AttributeStatement::fixed("true", None, ConflictResolution::Merge, string_attr("tags", "/", &["b", "c"])),
        )
        .statement(
            "/",
            AttributeStatement::fixed("true", None, ConflictResolution::Merge, string_attr("perm", "/", &["write"])),
        );

    let effective = fixture.evaluate("/", None);
    assert_eq!(values(&effective, "tags"), vec!["a", "b", "c"]);
    assert_eq!(values(&effective, "perm"), vec!["read"]);
}

#[test]
fn test_dynamic_values_are_converted_with_the_type_syntax() {
    let fixture = Fixture::new()
        .direct(string_attr("tags", "/", &["x", "y"]))
        .statement(
            "/",
            AttributeStatement::dynamic("true", None, ConflictResolution::Skip, "z", "attrs['tags'][1].toUpperCase()"),
        )
        .statement(
            "/",
            AttributeStatement::dynamic("true", None, ConflictResolution::Skip, "level", "attrs['tags'].size() + 40"),
        )
        .statement(
            "/",
            AttributeStatement::dynamic("true", None, ConflictResolution::Skip, "perm", "idsByType['userName']"),
        );

    let effective = fixture.evaluate("/", None);
    assert_eq!(values(&effective, "z"), vec!["Y"]);
    assert_eq!(values(&effective, "level"), vec!["42"]);
    assert_eq!(effective["level"].value_syntax(), "integer");
    assert_eq!(values(&effective, "perm"), vec!["alice"]);
}

#[test]
fn test_dynamic_statement_skipped_on_conversion_failure_or_null() {
    let fixture = Fixture::new()
        .statement(
            "/",
            AttributeStatement::dynamic("true", None, ConflictResolution::Skip, "level", "'not a number'"),
        )
        .statement(
            "/",
            AttributeStatement::dynamic("true", None, ConflictResolution::Skip, "perm", "attr['missing']"),
        )
        .statement(
            "/",
            AttributeStatement::dynamic("true", None, ConflictResolution::Skip, "tags", "['a', null]"),
        );

    let effective = fixture.evaluate("/", None);
    assert!(!effective.contains_key("level"));
    assert!(!effective.contains_key("perm"));
    assert!(!effective.contains_key("tags"));
}

#[test]
fn test_broken_condition_skips_only_that_statement() {
    let fixture = Fixture::new()
        .statement(
            "/",
            AttributeStatement::fixed("attr['role'].size() > 0", None, ConflictResolution::Skip, string_attr("x", "/", &["1"])),
        )
        .statement(
            "/",
            AttributeStatement::fixed("'not a boolean'", None, ConflictResolution::Skip, string_attr("y", "/", &["1"])),
        )
        .statement(
            "/",
            AttributeStatement::fixed("(((", None, ConflictResolution::Skip, string_attr("z", "/", &["1"])),
        )
        .statement(
            "/",
            AttributeStatement::fixed("entityId == 7", None, ConflictResolution::Skip, string_attr("perm", "/", &["ok"])),
        );

    let effective = fixture.evaluate("/", None);
    assert!(!effective.contains_key("x"));
    assert!(!effective.contains_key("y"));
    assert!(!effective.contains_key("z"));
    assert_eq!(values(&effective, "perm"), vec!["ok"]);
}

#[test]
fn test_context_variables() {
    let fixture = Fixture::new()
        .group(Group::new(path("/staff")).with_displayed_name("Staff members"))
        .statement(
            "/staff",
            AttributeStatement::fixed(
                "groupName == '/staff' && groups contains '/' && groupsObj['/staff'].displayedName == 'Staff members'",
                None,
                ConflictResolution::Skip,
                string_attr("perm", "/staff", &["ok"]),
            ),
        )
        .statement(
            "/staff",
            AttributeStatement::dynamic("eattr == null", None, ConflictResolution::Skip, "x", "idsByType['email'][0]"),
        );

    let effective = fixture.evaluate("/staff", None);
    assert_eq!(values(&effective, "perm"), vec!["ok"]);
    assert_eq!(values(&effective, "x"), vec!["alice@example.com"]);
}

#[test]
fn test_downwards_extra_attributes() {
    let fixture = Fixture::new()
        .group(Group::new(path("/A")))
        .direct(string_attr("x", "/A/B", &["v"]))
        .statement(
            "/A/B",
            AttributeStatement::fixed("attr['x'] == 'v'", None, ConflictResolution::Skip, string_attr("z", "/A/B", &["derived"])),
        )
        .statement(
            "/A",
            AttributeStatement::dynamic(
                "eattr['x'] == 'v'",
                Some(path("/A/B")),
                ConflictResolution::Skip,
                "y",
                "eattr['z']",
            ),
        );

    let effective = fixture.evaluate("/A", None);
    assert_eq!(values(&effective, "y"), vec!["derived"]);
    assert!(!effective.contains_key("x"));
}

#[test]
fn test_upwards_extra_attributes() {
    let fixture = Fixture::new()
        .direct(string_attr("x", "/A", &["parent"]))
        .group(Group::new(path("/A/B")))
        .statement(
            "/A/B",
            AttributeStatement::dynamic(
                "eattrs['x'].size() == 1",
                Some(path("/A")),
                ConflictResolution::Skip,
                "y",
                "eattr['x'] + '-child'",
            ),
        );

    let effective = fixture.evaluate("/A/B", None);
    assert_eq!(values(&effective, "y"), vec!["parent-child"]);
}

#[test]
fn test_extra_group_without_membership_is_ignored() {
    let mut fixture = Fixture::new()
        .group(Group::new(path("/A")))
        .group(Group::new(path("/A/B")))
        .statement(
            "/A",
            AttributeStatement::fixed(
                "eattrs.isEmpty()",
                Some(path("/A/B")),
                ConflictResolution::Skip,
                string_attr("perm", "/A", &["member"]),
            ),
        );
    assert_eq!(values(&fixture.evaluate("/A", None), "perm"), vec!["member"]);

    fixture.membership.remove(&path("/A/B"));
    assert!(!fixture.evaluate("/A", None).contains_key("perm"));
}

#[test]
fn test_self_referencing_extra_group_terminates() {
    let fixture = Fixture::new()
        .direct(string_attr("x", "/A", &["1"]))
        .statement(
            "/A",
            AttributeStatement::fixed("eattr['x'] == '1'", Some(path("/A")), ConflictResolution::Skip, string_attr("perm", "/A", &["self"])),
        );

    assert_eq!(values(&fixture.evaluate("/A", None), "perm"), vec!["self"]);
}

#[test]
fn test_unknown_group_has_only_direct_attributes() {
    let mut fixture = Fixture::new().direct(string_attr("x", "/gone", &["1"]));
    fixture.groups.retain(|g| !g.path.is_root());

    let effective = fixture.evaluate("/gone", None);
    assert_eq!(effective.len(), 1);
    assert_eq!(values(&effective, "x"), vec!["1"]);
}

#[test]
fn test_global_attributes_propagate_from_root() {
    let fixture = Fixture::new()
        .attribute_type(AttributeType::new("x", "string", 0, 1).with_global(true))
        .attribute_type(AttributeType::new("y", "string", 0, 1).with_global(true))
        .direct(string_attr("x", "/", &["root"]))
        .direct(string_attr("y", "/", &["root"]))
        .direct(string_attr("z", "/", &["root"]))
        .direct(string_attr("y", "/A", &["local"]));

    let effective = fixture.evaluate("/A", None);
    assert_eq!(values(&effective, "x"), vec!["root"]);
    assert!(!effective["x"].direct);
    assert_eq!(values(&effective, "y"), vec!["local"]);
    assert!(effective["y"].direct);
    assert!(!effective.contains_key("z"));

    let queried = fixture.evaluate("/A", Some("x"));
    assert_eq!(queried.len(), 1);
    assert!(fixture.evaluate("/A", Some("z")).is_empty());
}

#[test]
fn test_queried_attribute_limits_the_result() {
    let fixture = Fixture::new()
        .direct(string_attr("role", "/", &["admin"]))
        .statement(
            "/",
            AttributeStatement::fixed("true", None, ConflictResolution::Skip, string_attr("perm", "/", &["full"])),
        )
        .statement(
            "/",
            AttributeStatement::fixed("true", None, ConflictResolution::Skip, string_attr("x", "/", &["1"])),
        );

    let effective = fixture.evaluate("/", Some("perm"));
    assert_eq!(effective.keys().collect::<Vec<_>>(), vec!["perm"]);
    assert!(fixture.evaluate("/", Some("role"))["role"].direct);
}

#[test]
fn test_attribute_classes_restrict_statements() {
    let fixture = Fixture::new()
        .class(AttributesClass::simple("basic", ["perm"], Vec::<String>::new()))
        .direct(string_attr("sys:AttributeClasses", "/A", &["basic"]))
        .statement(
            "/A",
            AttributeStatement::fixed("true", None, ConflictResolution::Skip, string_attr("perm", "/A", &["ok"])),
        )
        .statement(
            "/A",
            AttributeStatement::fixed("true", None, ConflictResolution::Skip, string_attr("x", "/A", &["denied"])),
        );

    let effective = fixture.evaluate("/A", None);
    assert_eq!(values(&effective, "perm"), vec!["ok"]);
    assert!(!effective.contains_key("x"));
}

#[test]
fn test_evaluation_is_deterministic() {
    let fixture = Fixture::new()
        .direct(string_attr("tags", "/A", &["a"]))
        .direct(string_attr("x", "/A/B", &["b"]))
        .statement(
            "/A",
            AttributeStatement::dynamic("true", Some(path("/A/B")), ConflictResolution::Merge, "tags", "eattrs['x']"),
        )
        .statement(
            "/A",
            AttributeStatement::fixed("true", None, ConflictResolution::Merge, string_attr("tags", "/A", &["c"])),
        );

    let first = fixture.evaluate("/A", None);
    assert_eq!(values(&first, "tags"), vec!["a", "b", "c"]);
    for _ in 0..5 {
        assert_eq!(fixture.evaluate("/A", None), first);
    }
}

#[test]
fn test_validate_statements() {
    let snapshot = SchemaSnapshot::new(
        Vec::new(),
        [AttributeType::new("perm", "string", 0, 1)],
    );
    let engine = BuiltinExpressionEngine::new();

    let valid = Group::new(path("/A")).with_statement(AttributeStatement::dynamic(
        "groups contains '/A/B'",
        Some(path("/A/B")),
        ConflictResolution::Overwrite,
        "perm",
        "eattr['perm']",
    ));
    assert!(validate_statements(&valid, &engine, &snapshot).is_ok());

    let unknown_type = Group::new(path("/A")).with_statement(AttributeStatement::fixed(
        "true",
        None,
        ConflictResolution::Skip,
        string_attr("missing", "/A", &["1"]),
    ));
    assert!(matches!(
        validate_statements(&unknown_type, &engine, &snapshot),
        Err(ValidationError::InvalidStatement { .. })
    ));

    let broken = Group::new(path("/A")).with_statement(AttributeStatement::dynamic(
        "true",
        None,
        ConflictResolution::Skip,
        "perm",
        "attr[",
    ));
    assert!(validate_statements(&broken, &engine, &snapshot).is_err());

    let wrong_group = Group::new(path("/A")).with_statement(AttributeStatement::fixed(
        "true",
        None,
        ConflictResolution::Skip,
        string_attr("perm", "/", &["1"]),
    ));
    assert!(validate_statements(&wrong_group, &engine, &snapshot).is_err());

    let sibling = Group::new(path("/A")).with_statement(AttributeStatement::fixed(
        "true",
        Some(path("/C")),
        ConflictResolution::Skip,
        string_attr("perm", "/A", &["1"]),
    ));
    assert!(validate_statements(&sibling, &engine, &snapshot).is_err());
}
