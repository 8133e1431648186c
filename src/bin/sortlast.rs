use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use sortlast::{
    BoxScene, Communicator, DeviceAssignment, DevicePolicy, EngineOpts, Extent, HostIdentity,
    LocalGroup, MergeRule, ProcessTopology, RankShare, ReductionStrategy, SoftwareWindow,
    SynchronizedView, ViewManager, ViewOpts, Viewport,
};

#[derive(Parser, Debug)]
#[command(name = "sortlast", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a demo scene across an in-process group and write each tile as a PNG.
    Render(RenderArgs),
    /// Discover host topology for a simulated group and print device assignments.
    Topology(TopologyArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Depth,
    Blend,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Number of ranks.
    #[arg(long, default_value_t = 4)]
    ranks: usize,

    /// Display wall as ROWSxCOLS.
    #[arg(long, default_value = "1x1", value_parser = parse_pair)]
    tiles: (u32, u32),

    /// Window size per tile as WIDTHxHEIGHT.
    #[arg(long, default_value = "256x256", value_parser = parse_pair)]
    window: (u32, u32),

    /// Interactive resolution divisor.
    #[arg(long, default_value_t = 1)]
    reduction: u32,

    /// Merge rule.
    #[arg(long, value_enum, default_value_t = Mode::Depth)]
    mode: Mode,

    /// Engine options JSON; `--mode` overrides its merge rule.
    #[arg(long)]
    opts: Option<PathBuf>,

    /// Output directory.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct TopologyArgs {
    /// Host name of each rank, comma separated.
    #[arg(long, value_delimiter = ',', required = true)]
    hosts: Vec<String>,

    /// Accelerators per host.
    #[arg(long, default_value_t = 0)]
    devices: u32,

    /// Ranks per host that use a device: a number or `all`.
    #[arg(long, default_value = "all", value_parser = parse_rank_share)]
    gpu_ranks: RankShare,
}

fn parse_pair(s: &str) -> Result<(u32, u32), String> {
    let (a, b) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected AxB, got '{s}'"))?;
    let a = a.trim().parse().map_err(|e| format!("'{a}': {e}"))?;
    let b = b.trim().parse().map_err(|e| format!("'{b}': {e}"))?;
    Ok((a, b))
}

fn parse_rank_share(s: &str) -> Result<RankShare, String> {
    if s.eq_ignore_ascii_case("all") {
        return Ok(RankShare::All);
    }
    s.parse()
        .map(RankShare::Count)
        .map_err(|e| format!("expected a count or 'all', got '{s}': {e}"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Topology(args) => cmd_topology(args),
    }
}

fn engine_opts(args: &RenderArgs) -> anyhow::Result<EngineOpts> {
    let mut opts = match &args.opts {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read engine options '{}'", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parse engine options '{}'", path.display()))?
        }
        None => EngineOpts::default(),
    };
    opts.merge = match args.mode {
        Mode::Depth => MergeRule::Depth,
        Mode::Blend => MergeRule::Blend,
    };
    if opts.merge == MergeRule::Blend {
        opts.strategy = ReductionStrategy::DirectSend;
    }
    Ok(opts)
}

/// Rank `rank`'s partition of the demo scene.
///
/// Depth mode: each rank owns one vertical slab plus one diagonal block, so slabs
/// interleave in depth with their neighbours' blocks. Blend mode: every rank contributes a
/// translucent, offset square.
fn demo_scene(rank: usize, ranks: usize, mode: Mode) -> anyhow::Result<BoxScene> {
    const PALETTE: [[u8; 3]; 6] = [
        [230, 60, 60],
        [60, 200, 80],
        [60, 110, 230],
        [230, 200, 50],
        [190, 70, 200],
        [50, 200, 210],
    ];
    let [r, g, b] = PALETTE[rank % PALETTE.len()];
    let n = ranks as f64;
    let i = rank as f64;
    let scene = BoxScene::new(format!("rank-{rank}"));
    let scene = match mode {
        Mode::Depth => {
            let slab = Viewport::new(i / n, 0.0, (i + 1.0) / n, 1.0)?;
            let block = Viewport::new(
                i / n,
                (i + 0.5) / (n + 1.0),
                ((i + 1.5) / n).min(1.0),
                (i + 1.5) / (n + 1.0),
            )?;
            scene
                .with_box(slab, [r, g, b, 255], 0.5 + 0.1 * (i % 2.0))?
                .with_box(block, [r / 2, g / 2, b / 2, 255], 0.4 + 0.02 * i)?
        }
        Mode::Blend => {
            let off = 0.4 * i / n;
            let square = Viewport::new(0.1 + off, 0.1 + off, 0.5 + off, 0.5 + off)?;
            let a = 160u16;
            let premul = |c: u8| ((u16::from(c) * a + 127) / 255) as u8;
            scene.with_box(square, [premul(r), premul(g), premul(b), a as u8], 0.1 * (i + 1.0))?
        }
    };
    Ok(scene)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let opts = engine_opts(&args)?;
    let (rows, cols) = args.tiles;
    let window = Extent::new(args.window.0, args.window.1);
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("create output dir '{}'", args.out.display()))?;

    let group = LocalGroup::new(args.ranks)?;
    let results = group.run(|comm| -> anyhow::Result<Option<(PathBuf, Extent)>> {
        let rank = comm.rank();
        let mut target = SoftwareWindow::new(window);
        let mut views = ViewManager::new();
        views.set_tile_dimensions(rows, cols)?;

        let view = SynchronizedView::new(ViewOpts {
            engine: opts.clone(),
            ..ViewOpts::default()
        })?
        .with_stage(Box::new(demo_scene(rank, comm.size(), args.mode)?));
        let id = views.on_view_created(view);
        views.set_image_reduction_factor(id, args.reduction)?;

        let image = views.render(id, &mut target, &comm)?;
        if !image.is_valid() {
            return Ok(None);
        }
        let path = args.out.join(format!("tile_{rank}.png"));
        image.save_png(&path)?;
        Ok(Some((path, image.extent())))
    });

    for (rank, result) in results.into_iter().enumerate() {
        match result.with_context(|| format!("rank {rank} failed"))? {
            Some((path, extent)) => println!(
                "rank {rank}: {}x{} tile -> {}",
                extent.width,
                extent.height,
                path.display()
            ),
            None => println!("rank {rank}: no tile"),
        }
    }
    Ok(())
}

fn cmd_topology(args: TopologyArgs) -> anyhow::Result<()> {
    let policy = DevicePolicy {
        ranks_per_host_using_device: args.gpu_ranks,
        active_devices: None,
    };
    let hosts = &args.hosts;
    let results = LocalGroup::new(hosts.len())?.run(|comm| {
        let host = HostIdentity::new(hosts[comm.rank()].clone());
        ProcessTopology::discover(&comm, &host)
            .map(|t| (t, DeviceAssignment::plan(&t, &policy, args.devices)))
    });

    for (rank, result) in results.into_iter().enumerate() {
        let (t, device) = result.with_context(|| format!("rank {rank} failed"))?;
        let device = match device {
            DeviceAssignment::Cpu => "cpu".to_owned(),
            DeviceAssignment::Device { device } => format!("device {device}"),
        };
        println!(
            "rank {}/{} on {}: host rank {}/{}, {device}",
            t.world_rank, t.world_size, hosts[rank], t.host_rank, t.host_size
        );
    }
    Ok(())
}
