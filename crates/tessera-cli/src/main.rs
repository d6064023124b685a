//! Tessera CLI - run the sort and linear algebra workloads on a compute device
//! and cross-check them against the host.

use anyhow::{Context as _, Result, bail, ensure};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tessera_linalg::{Element, LinalgError, Matrix};
use tessera_runtime::{Context, ContextConfig, RuntimeError};
use tessera_sort::{BitonicSorter, ExecTarget, SortDirection, SortError, check_sorted};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Compute workloads on wgpu devices", long_about = None)]
#[command(version)]
struct Cli {
    /// Platform index, in the order Vulkan, Metal, DX12, GL, WebGPU
    #[arg(long, global = true)]
    platform: Option<usize>,

    /// Device class: all, gpu, cpu, accelerator
    #[arg(long, global = true, value_name = "CLASS")]
    device_class: Option<String>,

    /// Maximum number of devices to open
    #[arg(long, global = true, value_name = "N")]
    devices: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bitonic sort of a random array
    Sort {
        /// Array length, a power of two
        #[arg(short, long, default_value = "65536")]
        size: usize,

        /// Sort largest first
        #[arg(long)]
        descending: bool,

        /// Load the sort kernels from a WGSL file
        #[arg(long, value_name = "FILE")]
        kernel: Option<PathBuf>,

        /// Seed for the input array
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Element-wise add and diff of two random vectors
    Vecadd {
        /// Vector length
        #[arg(short, long, default_value = "1024")]
        size: usize,

        #[arg(long)]
        seed: Option<u64>,
    },
    /// Transpose a random matrix
    Transpose {
        #[arg(long, default_value = "64")]
        rows: usize,

        #[arg(long, default_value = "48")]
        cols: usize,

        #[arg(long)]
        seed: Option<u64>,
    },
    /// Multiply two random matrices
    Multiply {
        /// Rows of the left operand
        #[arg(short, default_value = "32")]
        m: usize,

        /// Columns of the left operand, rows of the right one
        #[arg(short, default_value = "32")]
        n: usize,

        /// Columns of the right operand
        #[arg(short, default_value = "32")]
        p: usize,

        /// Use f32 elements instead of i32
        #[arg(long)]
        float: bool,

        #[arg(long)]
        seed: Option<u64>,
    },
    /// Invert a random square matrix and check `A * A^-1` against the identity
    Invert {
        /// Rows and columns of the matrix
        #[arg(short, long, default_value = "32")]
        size: usize,

        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let start = Instant::now();
    match run(cli) {
        Ok(()) => {
            tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(kind = error_kind(&e), "{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    let config = context_config(&cli)?;
    let ctx = Context::new(&config).context("Failed to create compute context")?;

    match cli.command {
        Commands::Sort {
            size,
            descending,
            kernel,
            seed,
        } => cmd_sort(&ctx, size, descending, kernel, seed),
        Commands::Vecadd { size, seed } => cmd_vecadd(&ctx, size, seed),
        Commands::Transpose { rows, cols, seed } => cmd_transpose(&ctx, rows, cols, seed),
        Commands::Multiply {
            m,
            n,
            p,
            float,
            seed,
        } => {
            if float {
                cmd_multiply(&ctx, m, n, p, seed, |rng| rng.random_range(-1.0f32..1.0))
            } else {
                cmd_multiply(&ctx, m, n, p, seed, |rng| rng.random_range(-10i32..10))
            }
        }
        Commands::Invert { size, seed } => cmd_invert(&ctx, size, seed),
    }
}

/// Environment overrides first, then command-line flags on top.
fn context_config(cli: &Cli) -> Result<ContextConfig> {
    let mut config = ContextConfig::default().with_env_overrides()?;
    if let Some(platform) = cli.platform {
        config.platform_index = platform;
    }
    if let Some(class) = &cli.device_class {
        config.device_class = class.parse()?;
    }
    if let Some(devices) = cli.devices {
        config.device_count = devices;
    }
    config.validate()?;
    Ok(config)
}

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn cmd_sort(
    ctx: &Context,
    size: usize,
    descending: bool,
    kernel: Option<PathBuf>,
    seed: Option<u64>,
) -> Result<()> {
    let direction = if descending {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };
    let mut sorter = BitonicSorter::new();
    if let Some(path) = kernel {
        sorter = sorter.with_kernel_file(path);
    }

    let mut rng = rng(seed);
    let input: Vec<i32> = (0..size).map(|_| rng.random()).collect();

    let mut on_device = input.clone();
    let start = Instant::now();
    sorter.sort(&mut on_device, direction, ExecTarget::Device(ctx))?;
    let device_ms = start.elapsed().as_millis() as u64;
    check_sorted(&on_device, direction)?;

    let mut on_host = input;
    let start = Instant::now();
    sorter.sort(&mut on_host, direction, ExecTarget::Host)?;
    let host_ms = start.elapsed().as_millis() as u64;

    if let Some(index) = first_mismatch(&on_device, &on_host) {
        bail!(
            "device and host sorts disagree at {index}: {} vs {}",
            on_device[index],
            on_host[index]
        );
    }
    tracing::info!(size, ?direction, device_ms, host_ms, "sort verified");
    Ok(())
}

fn cmd_vecadd(ctx: &Context, size: usize, seed: Option<u64>) -> Result<()> {
    let mut rng = rng(seed);
    let a: Vec<i32> = (0..size).map(|_| rng.random_range(-1000..1000)).collect();
    let b: Vec<i32> = (0..size).map(|_| rng.random_range(-1000..1000)).collect();

    let sum = tessera_linalg::vector::add(ctx, &a, &b)?;
    let expected: Vec<i32> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
    if let Some(index) = first_mismatch(&sum, &expected) {
        bail!("vector add mismatch at {index}: {} vs {}", sum[index], expected[index]);
    }

    let difference = tessera_linalg::vector::diff(ctx, &a, &b)?;
    let expected: Vec<i32> = a.iter().zip(&b).map(|(x, y)| x - y).collect();
    if let Some(index) = first_mismatch(&difference, &expected) {
        bail!(
            "vector diff mismatch at {index}: {} vs {}",
            difference[index],
            expected[index]
        );
    }

    tracing::info!(size, "vector add and diff verified");
    Ok(())
}

fn cmd_transpose(ctx: &Context, rows: usize, cols: usize, seed: Option<u64>) -> Result<()> {
    let mut rng = rng(seed);
    let m = random_matrix(&mut rng, rows, cols, |rng| rng.random_range(-100i32..100))?;

    let t = tessera_linalg::transpose(ctx, &m)?;
    ensure!(t == m.transpose_host(), "device transpose differs from host");

    tracing::info!(rows, cols, "transpose verified");
    Ok(())
}

fn cmd_multiply<T: Element>(
    ctx: &Context,
    m: usize,
    n: usize,
    p: usize,
    seed: Option<u64>,
    sample: impl Fn(&mut StdRng) -> T,
) -> Result<()> {
    let mut rng = rng(seed);
    let a = random_matrix(&mut rng, m, n, &sample)?;
    let b = random_matrix(&mut rng, n, p, &sample)?;

    let device = tessera_linalg::multiply(ctx, &a, &b)?;
    let host = a.multiply_host(&b)?;

    let mismatches = device
        .as_slice()
        .iter()
        .zip(host.as_slice())
        .filter(|(d, h)| !d.approx_eq(**h))
        .count();
    ensure!(mismatches == 0, "device product differs from host in {mismatches} elements");

    tracing::info!(m, n, p, element = std::any::type_name::<T>(), "multiply verified");
    Ok(())
}

fn cmd_invert(ctx: &Context, size: usize, seed: Option<u64>) -> Result<()> {
    let mut rng = rng(seed);
    let mut m = random_matrix(&mut rng, size, size, |rng| rng.random_range(-100.0f32..100.0))?;
    // A dominant diagonal keeps the random matrix well conditioned.
    let shift = 100.0 * size as f32;
    for i in 0..size {
        m.set(i, i, m.get(i, i)? + shift)?;
    }

    let inverse = tessera_linalg::inverse(ctx, &m)?;
    let product = tessera_linalg::multiply(ctx, &m, &inverse)?;

    let mismatches = product
        .as_slice()
        .iter()
        .zip(Matrix::<f32>::identity(size).as_slice())
        .filter(|(p, e)| !p.approx_eq(**e))
        .count();
    ensure!(mismatches == 0, "A * A^-1 differs from the identity in {mismatches} elements");

    tracing::info!(size, "inverse verified");
    Ok(())
}

fn random_matrix<T: Element>(
    rng: &mut StdRng,
    rows: usize,
    cols: usize,
    sample: impl Fn(&mut StdRng) -> T,
) -> Result<Matrix<T>> {
    let data = (0..rows * cols).map(|_| sample(rng)).collect();
    Ok(Matrix::from_vec(rows, cols, data)?)
}

fn first_mismatch<T: PartialEq>(a: &[T], b: &[T]) -> Option<usize> {
    a.iter().zip(b).position(|(x, y)| x != y)
}

fn error_kind(e: &anyhow::Error) -> &'static str {
    for cause in e.chain() {
        if let Some(e) = cause.downcast_ref::<SortError>() {
            return e.kind();
        }
        if let Some(e) = cause.downcast_ref::<LinalgError>() {
            return e.kind();
        }
        if let Some(e) = cause.downcast_ref::<RuntimeError>() {
            return e.kind();
        }
    }
    "Error"
}
