use clap::Parser;
use ring_store::config::{
    DEFAULT_MESSAGE_RATE, DEFAULT_REFILL_INTERVAL, DEFAULT_REPLICAS, NodeConfig,
};
use ring_store::membership::MembershipService;
use ring_store::membership::types::default_http_addr;
use ring_store::node::DataNode;
use ring_store::node::protocol::{Command, NodesUpdate};
use ring_store::transport::Postman;
use ring_store::transport::http::{HttpPostman, router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "ring-store", version, about = "Replicated key-value store node")]
struct Args {
    /// Gossip (UDP) address to bind, e.g. 127.0.0.1:5000.
    #[arg(long, env = "RING_STORE_BIND")]
    bind: SocketAddr,

    /// HTTP address for clients and inter-node traffic. Defaults to the gossip port + 1000.
    #[arg(long, env = "RING_STORE_HTTP")]
    http: Option<SocketAddr>,

    /// Gossip address of an existing member. Can be given multiple times.
    #[arg(long, env = "RING_STORE_SEED", value_delimiter = ',')]
    seed: Vec<SocketAddr>,

    /// Number of replica copies kept on the owner's successors.
    #[arg(long, env = "RING_STORE_REPLICAS", default_value_t = DEFAULT_REPLICAS)]
    replicas: usize,

    /// Outbound messages allowed per refill interval.
    #[arg(long, env = "RING_STORE_MESSAGE_RATE", default_value_t = DEFAULT_MESSAGE_RATE)]
    message_rate: usize,

    #[arg(
        long,
        env = "RING_STORE_REFILL_INTERVAL_MS",
        default_value_t = DEFAULT_REFILL_INTERVAL.as_millis() as u64
    )]
    refill_interval_ms: u64,

    /// How long an HTTP client waits for its answer before getting a 504.
    #[arg(long, env = "RING_STORE_CLIENT_TIMEOUT_MS", default_value_t = 5000)]
    client_timeout_ms: u64,

    #[arg(long, env = "RING_STORE_LOG_LEVEL", default_value = "info")]
    log_level: tracing::Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let http_addr = args.http.unwrap_or_else(|| default_http_addr(args.bind));
    let config = NodeConfig::new(args.replicas)
        .with_message_rate(args.message_rate)
        .with_refill_interval(Duration::from_millis(args.refill_interval_ms));

    tracing::info!("Starting node: gossip={} http={}", args.bind, http_addr);
    if !args.seed.is_empty() {
        tracing::info!("Seed nodes: {:?}", args.seed);
    } else {
        tracing::info!("Starting as seed node (founder)");
    }
    tracing::info!(
        "Replicas: {}, message rate: {} per {:?}",
        config.replicas,
        config.message_rate,
        config.refill_interval
    );

    // 1. Data node behind the HTTP substrate:
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let postman = HttpPostman::new(
        http_addr.to_string(),
        inbox_tx,
        Duration::from_millis(args.client_timeout_ms),
    )?;
    let me = postman.local_handle();
    let node_postman: Arc<dyn Postman> = postman.clone();
    let _node = DataNode::new(me.clone(), config, node_postman).spawn(inbox_rx);

    // 2. Membership (UDP gossip):
    let membership = MembershipService::new(args.bind, http_addr, args.seed).await?;
    tracing::info!("Node ID: {:?}", membership.local_node.id);
    membership.clone().start().await;

    // 3. Forward membership changes into the node:
    let mut view = membership.subscribe();
    let feed_postman = postman.clone();
    tokio::spawn(async move {
        loop {
            let nodes = view.borrow_and_update().clone();
            tracing::info!("Forwarding view of {} node(s)", nodes.len());
            feed_postman.deliver(&me, Command::NodesUpdate(NodesUpdate { nodes }));

            if view.changed().await.is_err() {
                tracing::warn!("Membership feed closed");
                break;
            }
        }
    });

    // 4. Spawn stats reporter:
    let stats_service = membership.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));

        loop {
            interval.tick().await;
            let alive = stats_service.get_alive_members();
            tracing::info!("Cluster stats: {} alive nodes", alive.len());
            for node in alive {
                tracing::debug!(
                    "  - {:?} gossip={} http={} (inc={})",
                    node.id,
                    node.gossip_addr,
                    node.http_addr,
                    node.incarnation
                );
            }
        }
    });

    // 5. Start HTTP server:
    let app = router(postman);

    tracing::info!("HTTP server listening on {}", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
