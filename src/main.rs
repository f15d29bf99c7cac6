// src/main.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[MAIN]Xyn>=====S===t===u===d===i===o===s======[R|$>

use xage_ntm::constants::{NTM_DEMO_BATCH_SIZE, NTM_DEMO_STEPS};
use xage_ntm::omnixtracker::{setup_global_subscriber, OmniXMetry};
use xage_ntm::{EncapsulatedNTM, NTMConfig, NTMError};
use anyhow::{Context, Result};
use dotenv::dotenv;
use ndarray::Array2;
use ndarray_rand::rand::{rngs::StdRng, SeedableRng};
use ndarray_rand::rand_distr::Bernoulli;
use ndarray_rand::RandomExt;
use std::env::args;
use tracing::info;

fn main() -> Result<()> {
    dotenv().ok();

    // Initialize OmniXMetry for logging
    let omnixmetry = OmniXMetry::init()?;
    setup_global_subscriber(omnixmetry.clone())?;
    info!("OmniXMetry initialized successfully.");

    // Process command-line arguments
    let args: Vec<String> = args().collect();
    if args.len() < 2 {
        return Err(anyhow::anyhow!("Usage: {} --version | run [steps] [batch]", args[0]));
    }

    match args[1].as_str() {
        "--version" => {
            println!("xynntm version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "run" => {
            let steps = parse_arg(&args, 2, *NTM_DEMO_STEPS)?;
            let batch_size = parse_arg(&args, 3, *NTM_DEMO_BATCH_SIZE)?;
            run(steps, batch_size)
        }
        other => Err(anyhow::anyhow!("Unknown command '{}'. Usage: {} --version | run [steps] [batch]", other, args[0])),
    }
}

fn parse_arg(args: &[String], index: usize, default: usize) -> Result<usize> {
    match args.get(index) {
        Some(raw) => raw.parse().with_context(|| format!("'{}' is not a valid count", raw)),
        None => Ok(default),
    }
}

fn logged(error: NTMError) -> NTMError {
    error.log();
    error
}

/// Feeds random bit vectors through a freshly initialised machine and logs
/// what the heads attend to.
fn run(steps: usize, batch_size: usize) -> Result<()> {
    let config = NTMConfig::from_env().context("Failed to load NTM configuration")?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let bits = Bernoulli::new(0.5).context("Failed to build input distribution")?;

    let mut ntm = EncapsulatedNTM::new(config.clone()).map_err(logged)?;
    ntm.init_sequence(batch_size).map_err(logged)?;

    for t in 0..steps {
        let input = Array2::random_using((batch_size, config.num_inputs), bits, &mut rng).mapv(|b| if b { 1.0f32 } else { 0.0 });
        let (output, state) = ntm.step(Some(input.view())).map_err(logged)?;
        let focus: Vec<usize> = state
            .heads
            .iter()
            .map(|w| {
                w.row(0)
                    .iter()
                    .enumerate()
                    .fold((0, f32::MIN), |best, (i, &x)| if x > best.1 { (i, x) } else { best })
                    .0
            })
            .collect();
        info!(
            step = t,
            output_mean = output.mean().unwrap_or(0.0),
            focus = ?focus,
            "step complete"
        );
    }

    info!(steps, batch_size, "sequence finished");
    Ok(())
}
