//! Command-line front end: argument parsing, `*.kubeka` discovery, and
//! dispatch into lint/job/daemon mode.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use walkdir::WalkDir;

use kubeka::error::{Diagnostics, KubekaError};
use kubeka::node::registry::NodeRegistry;
use kubeka::{eval, exec::executor, parser, scheduler, tree};

const DEFAULT_PATH: &str = "/etc/kubeka";

/// kubeka: continuous-deployment orchestrator
#[derive(Parser, Debug)]
#[command(
    name = "kubeka",
    version,
    group(clap::ArgGroup::new("mode").args(["daemon", "lint", "job"]).required(true))
)]
struct Args {
    /// Run every PERIODIC root on its own schedule until SIGINT
    #[arg(short, long)]
    daemon: bool,

    /// Validate every discovered file and report, without running anything
    #[arg(short, long)]
    lint: bool,

    /// Run a single ENTRYPOINT node by id, then exit
    #[arg(short, long, value_name = "ID")]
    job: Option<String>,

    /// Directory to recursively search for *.kubeka files (repeatable)
    #[arg(short, long = "path", value_name = "DIR")]
    paths: Vec<PathBuf>,

    /// Explicit *.kubeka file to load (repeatable)
    #[arg(short, long = "file", value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Promote warnings to errors
    #[arg(short = 'W', long)]
    werror: bool,
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Walks `paths` for `*.kubeka` files and merges with `explicit_files`,
/// de-duplicating by canonicalized path so a file reachable both via
/// `--path` and `--file` is only parsed once.
fn discover(paths: &[PathBuf], explicit_files: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    let mut all_paths: Vec<PathBuf> = paths.to_vec();
    all_paths.push(PathBuf::from(DEFAULT_PATH));

    for dir in &all_paths {
        for entry in WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().map(|e| e == "kubeka").unwrap_or(false))
        {
            push_unique(&mut out, &mut seen, entry.path().to_path_buf());
        }
    }
    for f in explicit_files {
        push_unique(&mut out, &mut seen, f.clone());
    }
    out
}

fn push_unique(out: &mut Vec<PathBuf>, seen: &mut HashSet<PathBuf>, path: PathBuf) {
    let canon = std::fs::canonicalize(&path).unwrap_or(path.clone());
    if seen.insert(canon) {
        out.push(path);
    }
}

fn load_registry(files: &[PathBuf], diags: &Diagnostics) -> NodeRegistry {
    let mut nodes = Vec::new();
    for f in files {
        if let Err(e) = parser::read_file(&mut nodes, f, diags) {
            diags.error(KubekaError::parse(f.display().to_string(), 0, e.to_string()));
        }
    }
    NodeRegistry::coalesce(nodes, diags)
}

fn run_lint(registry: &NodeRegistry, diags: &Diagnostics) -> i32 {
    registry.validate(diags);
    eprintln!(
        "{} nodes checked, {} errors, {} warnings",
        registry.len(),
        diags.nerrors(),
        diags.nwarnings()
    );
    if diags.is_clean() { 0 } else { 1 }
}

fn run_job(id: &str, registry: &NodeRegistry, diags: &Diagnostics) -> i32 {
    registry.validate(diags);
    if !diags.is_clean() {
        println!("::EXITCODE:1");
        return 1;
    }
    let Some(mut tree) = tree::instantiate(id, registry, diags) else {
        println!("::EXITCODE:1");
        return 1;
    };
    let root = tree.root.expect("instantiate sets root on success");
    eval::eval(&mut tree, root, diags);
    if !diags.is_clean() {
        println!("::EXITCODE:1");
        return 1;
    }
    let mut reports = Vec::new();
    let rc = executor::run(&mut tree, root, diags, &mut reports);
    for line in &reports {
        println!("{line}");
    }
    println!("::EXITCODE:{rc}");
    rc
}

fn run_daemon(registry: Arc<NodeRegistry>, diags: Arc<Diagnostics>) -> i32 {
    registry.validate(&diags);
    if !diags.is_clean() {
        return 1;
    }

    let periodic_ids: Vec<String> = registry
        .iter()
        .filter(|(_, n)| n.ty == kubeka::NodeType::Periodic)
        .map(|(id, _)| id.to_string())
        .collect();

    if periodic_ids.is_empty() {
        tracing::warn!("no PERIODIC nodes found, daemon has nothing to schedule");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_for_handler = shutdown.clone();
    let installed = ctrlc::set_handler(move || {
        shutdown_for_handler.store(true, Ordering::Release);
    });
    if let Err(e) = installed {
        tracing::error!("failed to install SIGINT handler: {e}");
    }

    let workers: Vec<_> = periodic_ids
        .into_iter()
        .filter_map(|id| scheduler::launch(id, registry.clone(), shutdown.clone(), diags.clone()))
        .collect();

    for w in workers {
        w.join();
    }

    if diags.is_clean() { 0 } else { 1 }
}

fn main() {
    init_logging();
    let args = Args::parse();
    let diags = Arc::new(Diagnostics::new(args.werror));

    let files = discover(&args.paths, &args.files);
    let registry = Arc::new(load_registry(&files, &diags));

    let code = if args.lint {
        run_lint(&registry, &diags)
    } else if let Some(id) = &args.job {
        run_job(id, &registry, &diags)
    } else {
        run_daemon(registry, diags)
    };

    std::process::exit(code);
}
