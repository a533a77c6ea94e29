use anyhow::{anyhow, bail, Context};
use clap::{ArgGroup, Parser, Subcommand};
use log::{info, warn};
use plysnap::action::CommandViewer;
use plysnap::config::Config;
use plysnap::console::AppBuilder;
use plysnap::dap::tracer::FileTracer;
use plysnap::dap::Transport;
use plysnap::preview::{ArrayWriter, SessionStorage, Strategy};
use plysnap::session::DapSession;
use std::net::ToSocketAddrs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (default: ~/.config/plysnap/config.toml)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs into this file instead of stderr.
    #[clap(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Attach to a paused Python debuggee and save point clouds on demand.
    Attach(AttachArgs),
    /// Remove artifact directories left by previous runs.
    Clean,
}

#[derive(clap::Args, Debug)]
#[command(group(ArgGroup::new("adapter_source").required(true).args(["connect", "adapter"])))]
struct AttachArgs {
    /// Address of a debug adapter listening on TCP (e.g. 127.0.0.1:5678).
    #[clap(long)]
    connect: Option<String>,

    /// Debug adapter program speaking DAP over stdio, arguments go after `--`.
    #[clap(long)]
    adapter: Option<String>,

    /// Trace DAP traffic into the log file. Requires --log-file.
    #[clap(long)]
    trace_dap: bool,

    /// Where to evaluate expressions: shallow (top frame) or deep (search by name).
    #[clap(long)]
    strategy: Option<Strategy>,

    /// How arrays and tensors are written: direct or open3d.
    #[clap(long)]
    array_writer: Option<ArrayWriter>,

    /// Command that opens saved files.
    #[clap(long)]
    viewer: Option<String>,

    #[arg(last = true)]
    adapter_args: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    let log_file = args.log_file.or(config.log_file.take());
    plysnap::log::init(log_file.as_deref())?;

    let storage = Arc::new(SessionStorage::new(config.base_dir()));
    match args.command {
        Cmd::Clean => {
            let removed = storage.purge_stale();
            println!("removed {removed} directories from {}", storage.base().display());
            Ok(())
        }
        Cmd::Attach(attach) => run_attach(attach, config, storage, log_file.as_deref()),
    }
}

fn run_attach(
    args: AttachArgs,
    mut config: Config,
    storage: Arc<SessionStorage>,
    log_file: Option<&Path>,
) -> anyhow::Result<()> {
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(writer) = args.array_writer {
        config.array_writer = writer;
    }
    if args.viewer.is_some() {
        config.viewer = args.viewer;
    }

    if config.storage.purge_on_start {
        let removed = storage.purge_stale();
        info!(target: "plysnap::storage", "purged {removed} stale directories");
    }

    let tracer = match (args.trace_dap, log_file) {
        (true, Some(path)) => Some(FileTracer::new(path)?),
        (true, None) => {
            warn!(target: "plysnap::dap", "--trace-dap requires --log-file; tracing disabled");
            None
        }
        (false, _) => None,
    };

    let transport = match (&args.connect, &args.adapter) {
        (Some(addr), _) => {
            let addr = addr
                .to_socket_addrs()
                .with_context(|| format!("resolve {addr}"))?
                .next()
                .ok_or_else(|| anyhow!("no address for {addr}"))?;
            info!(target: "plysnap::dap", "connect to {addr}");
            Transport::tcp(addr).with_context(|| format!("connect to {addr}"))?
        }
        (None, Some(program)) => {
            let program = if Path::new(program).exists() {
                PathBuf::from(program)
            } else {
                which::which(program).with_context(|| format!("adapter `{program}`"))?
            };
            info!(target: "plysnap::dap", "start adapter {}", program.display());
            Transport::spawn(&program, &args.adapter_args)
                .with_context(|| format!("start {}", program.display()))?
        }
        (None, None) => bail!("either --connect or --adapter is required"),
    };
    if let Some(tracer) = &tracer {
        tracer.line("session start");
    }

    let (session, events) =
        DapSession::attach(transport.with_tracer(tracer), config.attach_arguments()?)?;

    let viewer = config.viewer.as_deref().map(CommandViewer::new).transpose()?;
    let app = AppBuilder::new(config.preview_options(), storage)
        .with_viewer(viewer)
        .build(session, events)?;
    app.run()
}
