//! Example of a coordinator committing work held by two remote participants
//!
//! Each node enables its participant service through the admin command,
//! exports one transaction branch and ships the reference to the coordinator
//! as envelope bytes. The coordinator decodes, narrows and commits.
//!
//! Run with: cargo run --example distributed_transaction

use proven_config::{ConfigStore, DEFAULT_TARGET, SetResourceServiceCommand};
use proven_coordinator::{Coordinator, CoordinatorConfig};
use proven_engine::{MockClient, MockEngine};
use proven_protocol::Envelope;
use proven_resource::{MemoryResource, MemoryStore, ResourceService, helper};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Distributed Transaction Example ===\n");

    let engine = Arc::new(MockEngine::new());
    let store = MemoryStore::new();
    println!("✓ Created mock broker");

    // 1. Enable the participant service on both nodes
    let mut services = Vec::new();
    for (node, port) in [("node-1", 7001), ("node-2", 7002)] {
        let config = ConfigStore::new();
        let report = SetResourceServiceCommand::new()
            .enabled(true)
            .port(port)
            .execute(&config);
        println!("  [{}] {}", node, report);

        let client = MockClient::new(node.to_string(), engine.clone());
        let service = ResourceService::start(client, &config.get(DEFAULT_TARGET)?)?;
        println!("  [{}] Listening on {}", node, service.endpoint());
        services.push(service);
    }

    // 2. Begin a transaction
    let coordinator = Coordinator::new(
        MockClient::new("coordinator".to_string(), engine.clone()),
        CoordinatorConfig::default(),
    );
    let xid = coordinator.begin();
    println!("\n✓ Began transaction {}", xid);

    // 3. Each node exports a branch and sends its reference over
    for (i, service) in services.iter().enumerate() {
        let branch = xid.branch(i as u32 + 1);
        let resource = MemoryResource::new(format!("ledger-{}", i + 1), store.clone())
            .with_write(format!("account-{}", i + 1), "100");

        let object = service.export(branch, Box::new(resource))?;
        let bytes = helper::encode_any(Some(&object))?.to_bytes()?;

        coordinator
            .register_resource(&xid, &Envelope::from_bytes(&bytes)?)
            .await?;
        println!("  Registered {}", object.ior());
    }

    // 4. Commit
    let outcome = coordinator.commit(&xid).await?;
    println!("\n✓ Transaction {:?}", outcome.completion);
    for (participant, heuristic) in &outcome.heuristics {
        println!("  ! {} reported {}", participant, heuristic);
    }
    for participant in &outcome.unreachable {
        println!("  ! {} needs recovery", participant);
    }

    for key in ["account-1", "account-2"] {
        println!("  {} = {:?}", key, store.get(key));
    }

    Ok(())
}
