//! Demo binary: boots a single VSM node, registers a couple of local
//! capabilities, runs an operation through S1 and a short tool-chain,
//! and prints the resulting variety/gap accounting.

use std::sync::Arc;

use serde_json::json;
use vsm_sdk::{
    Chain, Coordination, FnHandler, Node, NodeConfigBuilder, Operation, Requirement, Step,
};

#[tokio::main]
async fn main() {
    vsm_sdk::init_tracing(false);

    let node = Node::new(NodeConfigBuilder::new().node_id("demo-node").build()).expect("node init");

    node.register_local_capability("echo", Arc::new(FnHandler(|p: serde_json::Value| Ok(p))))
        .await;
    node.register_local_capability(
        "double",
        Arc::new(FnHandler(|p: serde_json::Value| Ok(json!(p.as_i64().unwrap_or(0) * 2)))),
    )
    .await;

    let results = node
        .submit_operation(Coordination {
            operations: vec![Operation {
                capability: "echo".to_string(),
                params: json!({ "greeting": "hello" }),
                correlation_id: "demo-op-1".to_string(),
            }],
        })
        .await;
    println!("S1 execution results: {results:?}");

    let chain = Chain {
        id: "demo-chain".into(),
        name: "double-then-echo".into(),
        steps: vec![
            Step::new("doubled", "double", json!("context.input")),
            Step::new("echoed", "echo", json!("context.doubled")),
        ],
    };
    let execution = node.execute_chain(&chain, json!(21)).await;
    println!("chain execution: {execution:?}");

    node.create_crdt("demo-counter", vsm_sdk::CrdtKind::GCounter, json!({})).expect("create crdt");
    node.update_crdt("demo-counter", vsm_sdk::CrdtOp::Increment(5)).expect("update crdt");
    println!("counter value: {:?}", node.crdt_value("demo-counter"));

    let gap = node
        .calculate_variety_gap(5)
        .await;
    println!("variety gap (5 required capabilities): {gap:?}");

    let actions = node
        .evaluate_variety(&[Requirement {
            id: "demo-requirement".into(),
            kind: vsm_sdk::CapabilityKind::Operational,
            constraints: json!({}),
            priority: vsm_sdk::Priority::Medium,
            keywords: vec!["demo".into()],
        }])
        .await;
    println!("variety controller actions: {actions:?}");
}
