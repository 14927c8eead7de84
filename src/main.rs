use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use taint::bottleneck::Bottlenecks;
use taint::cache::BottleneckCache;
use taint::detect::standard_suite;
use taint::embed::{self, standard_projections, Projection};
use taint::error::Error;
use taint::extract::{self, FeatureExtractor};
use taint::report;
use taint::sweep::{self, PollutionSweep, DEFAULT_STEPS};

const TESTS: &[(&str, &str)] = &[
    ("benchmark", "pollution sweep of Cat and Flag with Noise, one CSV per pair"),
    ("isomap", "2-D projections of contaminated Cat sets, saved as .npy"),
];

const CLEAN_SETS: &[&str] = &["Cat", "Flag"];
const NEIGHBORS: usize = 25;
const DOG_FRACTION: f64 = 0.05;

#[derive(Parser, Debug)]
#[command(name = "taint")]
#[command(about = "Outlier detection benchmark on image bottleneck features")]
#[command(version)]
struct Args {
    /// Experiment to run (benchmark, isomap)
    #[arg(short, long)]
    test: Option<String>,

    /// Network architecture the bottlenecks come from (cache key suffix)
    #[arg(short, long, default_value = "MobileNet_1.0_224")]
    architecture: String,

    /// Directory holding one image folder per label
    #[arg(long, default_value = ".")]
    image_root: PathBuf,

    /// Bottleneck cache directory
    #[arg(long, default_value = "./Saved_bottlenecks")]
    cache_dir: PathBuf,

    /// Where reports and projections are written
    #[arg(long, default_value = "./results")]
    out_dir: PathBuf,

    /// Pollution sweep steps
    #[arg(long, default_value_t = DEFAULT_STEPS)]
    steps: usize,

    /// Seed for every randomised detector
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Re-extract bottlenecks even when cached
    #[arg(long)]
    refresh: bool,
}

struct Workspace {
    cache: BottleneckCache,
    extractor: Option<Box<dyn FeatureExtractor>>,
    image_root: PathBuf,
}

impl Workspace {
    fn load(&self, label: &str) -> Result<Bottlenecks> {
        let dir = self.image_root.join(label);
        self.cache
            .load_or_extract(&dir, self.extractor.as_deref())
            .with_context(|| format!("loading bottlenecks for {label}"))
    }
}

fn print_tests() {
    println!("Available tests:");
    for (name, about) in TESTS {
        println!("  {name:<10} {about}");
    }
}

fn run_benchmark(ctx: &Workspace, args: &Args) -> Result<()> {
    let noise = ctx.load("Noise")?;
    let detectors = standard_suite(args.seed);
    let sweep = PollutionSweep::new().with_steps(args.steps);

    for clean_label in CLEAN_SETS {
        let clean = ctx.load(clean_label)?;
        info!(
            "sweeping {} ({} rows) with Noise ({} rows)",
            clean_label,
            clean.len(),
            noise.len()
        );
        let result = sweep
            .run(&clean, &noise, &detectors)
            .with_context(|| format!("sweeping {clean_label} with Noise"))?;
        report::log_summary(&result);
        let path = args
            .out_dir
            .join(format!("benchmark_{clean_label}_Noise.csv"));
        report::write_curves_csv(&path, &result)?;
    }
    Ok(())
}

fn project_scenario(
    name: &str,
    data: &Bottlenecks,
    labels: &[u8],
    args: &Args,
) -> Result<()> {
    let dir = args.out_dir.join("isomap");
    report::write_labels_npy(&dir.join(format!("{name}_labels.npy")), labels)?;

    for projection in standard_projections(NEIGHBORS) {
        let points = match projection.project(data.rows()) {
            Ok(points) => points,
            Err(e @ Error::Disconnected { .. }) => {
                warn!("{name}: skipping {}: {e}", projection.name());
                continue;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("{name}: {}", projection.name()));
            }
        };
        let score = embed::separation(&points, labels)?;
        info!("{name}: {:<32} separation {score:.3}", projection.name());

        let file = format!("{name}_{}.npy", projection.name().replace(' ', "_"));
        report::write_projection_npy(&dir.join(file), &points)?;
    }
    Ok(())
}

fn run_isomap(ctx: &Workspace, args: &Args) -> Result<()> {
    let cat = ctx.load("Cat")?;
    let dog = ctx.load("Dog")?.take_fraction(DOG_FRACTION);
    let noise = ctx.load("Noise")?;

    let cat_dog = cat.concat(&dog, dog.len())?;
    let cat_dog_truth = sweep::ground_truth(cat.len(), dog.len());
    project_scenario("Cat_Dog", &cat_dog, &cat_dog_truth, args)?;

    let cat_dog_noise = cat_dog.concat(&noise, noise.len())?;
    let cat_dog_noise_truth = sweep::ground_truth(cat.len(), dog.len() + noise.len());
    project_scenario("Cat_Dog_Noise", &cat_dog_noise, &cat_dog_noise_truth, args)?;

    let cat_noise = cat.concat(&noise, noise.len())?;
    let cat_noise_truth = sweep::ground_truth(cat.len(), noise.len());
    project_scenario("Cat_Noise", &cat_noise, &cat_noise_truth, args)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let Some(test) = args.test.as_deref().filter(|t| TESTS.iter().any(|(n, _)| n == t)) else {
        if let Some(unknown) = args.test.as_deref() {
            warn!("unknown test {unknown:?}");
        }
        print_tests();
        return Ok(());
    };

    let ctx = Workspace {
        cache: BottleneckCache::new(&args.cache_dir, &args.architecture).with_refresh(args.refresh),
        extractor: extract::extractor_for(&args.architecture),
        image_root: args.image_root.clone(),
    };
    if ctx.extractor.is_none() {
        info!(
            "no built-in extractor for {}; bottlenecks must already be in {}",
            args.architecture,
            ctx.cache.dir().display()
        );
    }

    match test {
        "benchmark" => run_benchmark(&ctx, &args),
        "isomap" => run_isomap(&ctx, &args),
        other => anyhow::bail!("test {other} is listed but has no runner"),
    }
}
