//! Statement Evaluation Benchmarks
//!
//! Measures effective attribute resolution over group trees of growing depth,
//! each group carrying a condition on the extra attributes of its child.

use attribute_engine::expression::BuiltinExpressionEngine;
use attribute_engine::model::{
    Attribute, AttributeExt, AttributeStatement, AttributeType, ConflictResolution, Group,
    GroupPath, Identity, UNLIMITED_ELEMENTS,
};
use attribute_engine::statements::{
    AttributeMap, EffectiveAttributesEvaluator, EntitySnapshot, SchemaSnapshot,
};
use attribute_engine::syntax::SyntaxRegistry;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::collections::{BTreeSet, HashMap};

struct Scenario {
    lookups: SchemaSnapshot,
    groups: BTreeSet<GroupPath>,
    direct: HashMap<GroupPath, AttributeMap>,
    identities: Vec<Identity>,
    leaf: GroupPath,
    top: GroupPath,
}

/// A chain `/g0/g1/...` where every group derives `level` from its child.
fn chain(depth: usize) -> Scenario {
    let mut paths = vec![GroupPath::root()];
    for i in 0..depth {
        let next = paths[i].child(&format!("g{i}")).unwrap();
        paths.push(next);
    }

    let mut groups = Vec::new();
    for (i, path) in paths.iter().enumerate() {
        let mut group = Group::new(path.clone());
        if let Some(child) = paths.get(i + 1) {
            group = group.with_statement(AttributeStatement::dynamic(
                "eattrs['level'] != null",
                Some(child.clone()),
                ConflictResolution::Merge,
                "level",
                "eattrs['level']",
            ));
        }
        groups.push(group);
    }

    let leaf = paths[depth].clone();
    let level = Attribute::new("level", "string", leaf.clone(), ["leaf"]);
    let direct = HashMap::from([(
        leaf.clone(),
        HashMap::from([("level".to_string(), AttributeExt::direct(level))]),
    )]);

    Scenario {
        lookups: SchemaSnapshot::new(
            groups,
            [AttributeType::new("level", "string", 0, UNLIMITED_ELEMENTS)],
        ),
        groups: paths.iter().cloned().collect(),
        direct,
        identities: vec![Identity::new("userName", "bench", 1)],
        top: paths[1.min(depth)].clone(),
        leaf,
    }
}

fn bench_directed_collection(c: &mut Criterion) {
    let syntaxes = SyntaxRegistry::with_defaults();
    let engine = BuiltinExpressionEngine::new();
    let classes = HashMap::new();
    let mut group = c.benchmark_group("directed_collection");

    for depth in [2usize, 8, 32] {
        let scenario = chain(depth);
        let entity = EntitySnapshot {
            identities: &scenario.identities,
            groups: &scenario.groups,
            direct_attributes: &scenario.direct,
            known_classes: &classes,
        };

        group.bench_with_input(BenchmarkId::new("top", depth), &scenario, |b, s| {
            b.iter(|| {
                let evaluator =
                    EffectiveAttributesEvaluator::new(&syntaxes, &engine, &s.lookups, entity);
                black_box(evaluator.get_effective_attributes(&s.top, None))
            })
        });
        group.bench_with_input(BenchmarkId::new("leaf", depth), &scenario, |b, s| {
            b.iter(|| {
                let evaluator =
                    EffectiveAttributesEvaluator::new(&syntaxes, &engine, &s.lookups, entity);
                black_box(evaluator.get_effective_attributes(&s.leaf, Some("level")))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_directed_collection);
criterion_main!(benches);
