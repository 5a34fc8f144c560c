use std::net::SocketAddr;
use std::sync::Arc;

use memory_cluster::addrspace::{AddressTable, initial_layout};
use memory_cluster::config::ClusterConfig;
use memory_cluster::memory::MemoryManager;
use memory_cluster::rpc::client::PeerClient;
use memory_cluster::rpc::connect::spawn_peer_connectors;
use memory_cluster::rpc::handlers::router;
use memory_cluster::rpc::protocol::RunTaskRequest;

/// Python snippet sent once by the master to prove the interpreter loop on
/// the big SoC is reachable and keeps state across calls.
const BOOTSTRAP_SNIPPET: &str = r#"
try:
    shared_counter += 1
except NameError:
    shared_counter = 1
print(f"counter is now {shared_counter}")
"#;

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {} --mode master|agent [--config <path>] [--rpc-port <port>]",
        program
    );
    eprintln!("Example: {} --mode agent --config config/socs.json --rpc-port 8080", program);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("memory-cluster");

    let mut mode = String::from("master");
    let mut config_path = String::from("config/socs.json");
    let mut rpc_port: u16 = 8080;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--mode" => {
                let Some(value) = args.get(i + 1) else { usage(program) };
                mode = value.clone();
                i += 2;
            }
            "--config" => {
                let Some(value) = args.get(i + 1) else { usage(program) };
                config_path = value.clone();
                i += 2;
            }
            "--rpc-port" => {
                let Some(value) = args.get(i + 1) else { usage(program) };
                rpc_port = value.parse()?;
                i += 2;
            }
            "--help" | "-h" => usage(program),
            _ => {
                i += 1;
            }
        }
    }

    let cfg = ClusterConfig::load(&config_path)?;
    tracing::info!("Loaded cluster config with {} SoCs", cfg.socs.len());

    match mode.as_str() {
        "agent" => run_agent(cfg, rpc_port).await,
        "master" => run_master(cfg).await,
        other => {
            eprintln!("Unknown mode: {}", other);
            std::process::exit(1);
        }
    }
}

/// Serves the fabric RPC endpoints and connects outward to every peer.
async fn run_agent(cfg: ClusterConfig, rpc_port: u16) -> anyhow::Result<()> {
    let name = node_name()?;
    let Some(self_cfg) = cfg.find(&name) else {
        anyhow::bail!("no config entry for node {}; set NODE_NAME to one of the configured SoCs", name);
    };

    let regions = initial_layout(&cfg.socs);
    let table = Arc::new(AddressTable::new(regions)?);
    let manager = Arc::new(MemoryManager::new(&self_cfg.name, table.clone()));

    tracing::info!(
        "Node {} contributes {} MB of a {} MB global space (soft limit {} bytes)",
        self_cfg.name,
        self_cfg.memory_mb,
        table.total_capacity() / (1024 * 1024),
        manager.soft_limit()
    );

    spawn_peer_connectors(manager.clone(), &cfg.socs);

    let app = router(manager);
    let addr = SocketAddr::from(([0, 0, 0, 0], rpc_port));
    tracing::info!("RPC server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Sends the bootstrapping task to the big SoC and reports the result.
async fn run_master(cfg: ClusterConfig) -> anyhow::Result<()> {
    let Some(big) = cfg.big_soc() else {
        anyhow::bail!("no big SoC with a python port configured");
    };

    let client = PeerClient::new(&big.name, &big.address);
    let task = RunTaskRequest {
        id: uuid::Uuid::new_v4().to_string(),
        code_type: "python".to_string(),
        code: BOOTSTRAP_SNIPPET.to_string(),
        args: vec![],
    };

    tracing::info!("Sending bootstrap task {} to {} at {}", task.id, big.name, big.address);
    let response = client.run_task(&task).await?;

    if let Some(error) = response.error {
        tracing::error!("Bootstrap task failed: {}", error);
        std::process::exit(1);
    }

    tracing::info!("Bootstrap task result: {}", response.result);
    Ok(())
}

/// An agent identifies itself by `NODE_NAME`, falling back to the host name
/// so that deployments can keep SoC names aligned with hostnames.
fn node_name() -> anyhow::Result<String> {
    if let Ok(name) = std::env::var("NODE_NAME") {
        return Ok(name);
    }
    sysinfo::System::host_name()
        .ok_or_else(|| anyhow::anyhow!("cannot determine host name; set NODE_NAME"))
}
