use criterion::{black_box, criterion_group, criterion_main, Criterion};

use qtiscore_core::context::ResponseProcessorContext;
use qtiscore_core::logging::NullLogger;
use qtiscore_core::model::{AssessmentItem, BaseType, OutcomeDeclaration};
use qtiscore_core::node::Node;
use qtiscore_core::operators::custom::standard_custom_operators;
use qtiscore_core::resolve::resolve_operand;
use qtiscore_core::results::ItemResult;
use qtiscore_core::OperatorRegistry;

fn item() -> AssessmentItem {
    AssessmentItem {
        identifier: "ITM-1".into(),
        outcome_declarations: (0..20)
            .map(|i| OutcomeDeclaration::float(format!("OUT_{i}"), i as f64))
            .collect(),
        response_declarations: vec![],
        response_processing: None,
    }
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    let registry = OperatorRegistry::standard();
    let logger = NullLogger;
    let custom = standard_custom_operators();
    let item = item();

    let flat_sum = Node::operator(
        "sum",
        (0..20).map(|i| Node::variable(format!("OUT_{i}"))).collect(),
    );

    let nested = (0..10).fold(Node::base_value(BaseType::Float, "1"), |acc, i| {
        Node::operator(
            if i % 2 == 0 { "sum" } else { "product" },
            vec![acc, Node::base_value(BaseType::Float, "1.5")],
        )
    });

    let custom_operator = Node::operator(
        "customOperator",
        vec![Node::base_value(BaseType::String, "12,75")],
    )
    .with_attribute("definition", "depcp:ParseCommaDecimal");

    for (name, node) in [
        ("flat_sum", &flat_sum),
        ("nested", &nested),
        ("custom_operator", &custom_operator),
    ] {
        group.bench_function(name, |b| {
            let mut item_result = ItemResult::new("ITM-1");
            let ctx = ResponseProcessorContext::new(
                &registry,
                &logger,
                &custom,
                &item,
                &mut item_result,
                None,
            );
            b.iter(|| resolve_operand(black_box(node), &ctx))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
