//! Windlass - cloud instance lifecycle pipeline
//!
//! ## Usage
//!
//! ```bash
//! # Start an instance, wait for readiness and SSH, print phase metrics
//! windlass up --instance-id i-0abc123
//!
//! # Start with an elastic IP in a VPC subnet
//! windlass up --instance-id i-0abc123 --subnet-id subnet-9fe2 --elastic-ip 203.0.113.10
//!
//! # Terminate, detaching addresses and cancelling any pending spot request
//! windlass destroy --instance-id i-0abc123
//! ```
//!
//! Ctrl-C during `up` does not abort: it sets the cooperative interrupt flag,
//! the remaining waits are skipped, and the pipeline finishes its pass.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use windlass::{
    AwsProvider, InstanceSshProbe, InterruptSignal, LifecycleOrchestrator, MachineRecord,
    RegionConfig, TracingNotifier,
};

/// Windlass: start, address, and terminate cloud compute instances
#[derive(Parser)]
#[command(name = "windlass")]
#[command(about = "Cloud instance lifecycle pipeline", long_about = None)]
struct Cli {
    /// AWS region (default: us-east-1)
    #[arg(long, global = true, default_value = windlass::DEFAULT_REGION)]
    region: String,

    /// Local data directory for machine state (spot request id)
    #[arg(long, global = true, default_value = ".windlass")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an instance and wait until it is ready and reachable
    Up {
        /// EC2 instance id
        #[arg(long)]
        instance_id: String,

        /// Subnet id; presence implies VPC addressing
        #[arg(long)]
        subnet_id: Option<String>,

        /// Elastic IP literal to associate once the instance is ready
        #[arg(long)]
        elastic_ip: Option<String>,

        /// Allocate a fresh elastic IP when no literal is given
        #[arg(long)]
        allocate_elastic_ip: bool,

        /// Seconds to wait for the instance to become ready
        #[arg(long, default_value_t = windlass::DEFAULT_INSTANCE_READY_TIMEOUT_SECS)]
        instance_ready_timeout: u64,

        /// Port probed for SSH reachability
        #[arg(long, default_value_t = windlass::DEFAULT_SSH_PORT)]
        ssh_port: u16,
    },

    /// Terminate an instance and clean up its addresses and spot request
    Destroy {
        /// EC2 instance id
        #[arg(long)]
        instance_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let provider = Arc::new(AwsProvider::from_env(Some(cli.region.clone())).await);
    let orchestrator =
        LifecycleOrchestrator::new(provider.clone(), Arc::new(TracingNotifier));

    match cli.command {
        Commands::Up {
            instance_id,
            subnet_id,
            elastic_ip,
            allocate_elastic_ip,
            instance_ready_timeout,
            ssh_port,
        } => {
            let mut machine = MachineRecord::new(instance_id.clone(), cli.data_dir);
            let region = RegionConfig {
                subnet_id,
                elastic_ip,
                allocate_elastic_ip,
                instance_ready_timeout,
            };

            let interrupt = InterruptSignal::new();
            {
                let interrupt = interrupt.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupt received, remaining waits will be skipped");
                        interrupt.trigger();
                    }
                });
            }

            let communicator = InstanceSshProbe::new(provider.clone(), instance_id.clone())
                .with_port(ssh_port);

            let metrics = orchestrator
                .start(&mut machine, &region, &communicator, &interrupt)
                .await?;

            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }

        Commands::Destroy { instance_id } => {
            let mut machine = MachineRecord::new(instance_id, cli.data_dir);
            orchestrator.terminate(&mut machine).await?;
        }
    }

    Ok(())
}
