//! taskboard - task board client CLI
//!
//! 設定の確認、トランザクションの組み立て、インメモリ台帳でのデモを行います。
//! RPC トランスポートと署名はこのバイナリには含みません。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use taskboard_core::domain::{Address, BoardId};
use taskboard_core::impls::InMemoryLedger;
use taskboard_core::tx::TransactionBuilder;
use taskboard_core::{ClientConfig, Operation, SchemaVersion, StateClient, StateClientBuilder};

const DEMO_PACKAGE_ID: &str = "0xdemo";

/// taskboard - task board client
#[derive(Parser, Debug)]
#[command(name = "taskboard")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to client configuration file (falls back to TASKBOARD_* env vars)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the resolved configuration and RPC endpoint
    Config,

    /// Build the Move call for an operation given as JSON (e.g. '{"op":"create_board","name":"x"}')
    Build {
        /// Operation JSON; reads stdin when omitted
        operation: Option<String>,
    },

    /// Run a board scenario against an in-memory ledger and print the final state
    Demo {
        /// Number of tasks to create
        #[arg(short = 'n', long, default_value = "3")]
        tasks: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    match cli.command {
        Commands::Config => show_config(cli.config.as_deref()),
        Commands::Build { operation } => build(cli.config.as_deref(), operation),
        Commands::Demo { tasks } => runtime.block_on(demo(tasks)),
    }
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    match path {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => ClientConfig::from_env().context("failed to load config from environment"),
    }
}

fn show_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    let output = json!({
        "config": config,
        "rpc_endpoint": config.rpc_endpoint(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn build(path: Option<&Path>, operation: Option<String>) -> Result<()> {
    let config = load_config(path)?;
    let text = match operation {
        Some(text) => text,
        None => std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?,
    };
    if text.trim().is_empty() {
        bail!("no operation given");
    }
    let operation: Operation = serde_json::from_str(&text).context("invalid operation JSON")?;

    let request = TransactionBuilder::new(config.package_id.clone())
        .with_clock(config.clock_object_id.clone())
        .build(&operation)
        .context("failed to build transaction")?;
    info!(call = %request.call.target(), "built transaction");
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}

/// 台帳 → クライアント → 書き込み → 再読込 を一通り流す
async fn demo(tasks: u64) -> Result<()> {
    // (A) 台帳と 2 人分のクライアント（所有者と検証者）
    let ledger = InMemoryLedger::new(DEMO_PACKAGE_ID).with_page_size(2);
    let owner = Address::new("0xa11ce");
    let verifier = Address::new("0xb0b");
    let owner_client = client_for(&ledger, owner.clone())?;
    let verifier_client = client_for(&ledger, verifier.clone())?;

    // (B) ボード作成とメンバー追加
    let created = owner_client
        .mutate(Operation::CreateBoard {
            name: "Demo board".to_string(),
            description: Some("created by taskboard demo".to_string()),
            verifier: Some(verifier.clone()),
        })
        .await
        .context("create board")?;
    let board = BoardId::new(
        created
            .created_id
            .context("create board reported no board id")?,
    );
    owner_client
        .mutate(Operation::AddMember {
            board: board.clone(),
            admin_cap: None,
            member: verifier.clone(),
            role: None,
        })
        .await
        .context("add member")?;

    // (C) タスクを作って進める（最初のタスクは検証まで通す）
    for i in 0..tasks {
        owner_client
            .mutate(Operation::CreateTask {
                board: board.clone(),
                title: format!("task #{i}"),
                description: format!("demo task {i}"),
                category: 0,
                weight_pct: 10,
                due_ts_ms: None,
            })
            .await
            .with_context(|| format!("create task {i}"))?;
    }
    if tasks > 0 {
        owner_client
            .mutate(Operation::AssignTask {
                board: board.clone(),
                task: 0,
                assignee: owner.clone(),
            })
            .await
            .context("assign task")?;
        owner_client
            .mutate(Operation::AdvanceStatus {
                board: board.clone(),
                task: 0,
                status: 1,
            })
            .await
            .context("start task")?;
        owner_client
            .mutate(Operation::RequestVerification {
                board: board.clone(),
                task: 0,
                proof_hash: "sha256:demo".to_string(),
                commit_hash: "0000000".to_string(),
            })
            .await
            .context("request verification")?;
        verifier_client
            .mutate(Operation::AdvanceStatus {
                board: board.clone(),
                task: 0,
                status: SchemaVersion::Verified.completed_status(),
            })
            .await
            .context("verify task")?;
    }

    // (D) 台帳から読み直して出力
    let output = json!({
        "board": owner_client.read_board(&board).await?,
        "members": owner_client.read_members_of_board(&board).await?,
        "tasks": owner_client.read_tasks_of_board(&board).await?,
        "stats": owner_client.board_stats(&board).await?,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn client_for(ledger: &InMemoryLedger, sender: Address) -> Result<StateClient> {
    let ledger = Arc::new(ledger.as_sender(sender));
    StateClientBuilder::new()
        .package_id(ledger.package_id())
        .reader(ledger.clone())
        .submitter(ledger)
        .build()
        .context("failed to build client")
}
