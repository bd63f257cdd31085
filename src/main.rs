use std::path::PathBuf;

use anyhow::Context;
use candle_core::Device;
use clap::Parser;
use speculative_sampling::{
    load_scorer, AutoregressiveDecoder, DecodeConfig, GenerationOutput, ModelSize,
    SpeculativeDecoder, TextGenerator,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "speculative-sampling")]
#[command(about = "Compare autoregressive and speculative decoding on GPT-2")]
struct Args {
    /// Input prompt
    #[arg(short, long, default_value = "Alan Turing theorized that computers would one day become")]
    prompt: String,

    /// Number of tokens to generate
    #[arg(short, long)]
    n_tokens: Option<usize>,

    /// Draft model size (124M, 355M, 774M, 1558M)
    #[arg(long)]
    draft_model: Option<ModelSize>,

    /// Target model size (124M, 355M, 774M, 1558M)
    #[arg(long)]
    target_model: Option<ModelSize>,

    /// Tokens drafted per speculative iteration (K)
    #[arg(short = 'k', long)]
    lookahead: Option<usize>,

    /// Random seed (123 unless a config file is given)
    #[arg(long)]
    seed: Option<u64>,

    /// Sampling temperature (0 = greedy)
    #[arg(long)]
    temperature: Option<f32>,

    /// Top-k filtering (0 = disabled)
    #[arg(long)]
    top_k: Option<usize>,

    /// Top-p filtering (1.0 = disabled)
    #[arg(long)]
    top_p: Option<f32>,

    /// Checkpoint revision on the Hub
    #[arg(long)]
    revision: Option<String>,

    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run on CPU even if an accelerator is available
    #[arg(long)]
    cpu: bool,
}

impl Args {
    fn decode_config(&self) -> anyhow::Result<DecodeConfig> {
        let mut config = match &self.config {
            Some(path) => DecodeConfig::from_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => DecodeConfig {
                seed: Some(123),
                ..Default::default()
            },
        };

        if let Some(n) = self.n_tokens {
            config.max_tokens = n;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(size) = self.draft_model {
            config.speculative.draft_model = size;
        }
        if let Some(size) = self.target_model {
            config.speculative.target_model = size;
        }
        if let Some(k) = self.lookahead {
            config.speculative.num_speculative_tokens = k;
        }
        if let Some(t) = self.temperature {
            config.sampling.temperature = t;
        }
        if let Some(k) = self.top_k {
            config.sampling.top_k = k;
        }
        if let Some(p) = self.top_p {
            config.sampling.top_p = p;
        }
        if let Some(revision) = &self.revision {
            config.speculative.revision = revision.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

fn select_device(cpu: bool) -> anyhow::Result<Device> {
    if cpu {
        return Ok(Device::Cpu);
    }
    if candle_core::utils::cuda_is_available() {
        return Ok(Device::new_cuda(0)?);
    }
    if candle_core::utils::metal_is_available() {
        return Ok(Device::new_metal(0)?);
    }
    Ok(Device::Cpu)
}

fn report(label: &str, output: &GenerationOutput) {
    println!("\n{label}\n{}", "-".repeat(label.len()));
    println!("Time: {:.2}s ({:.2} tokens/s)", output.elapsed.as_secs_f64(), output.tokens_per_second());
    println!("Text: {}", output.text);
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = args.decode_config()?;
    let device = select_device(args.cpu)?;
    let spec = &config.speculative;
    let seed = config.resolve_seed();

    info!(
        draft = %spec.draft_model,
        target = %spec.target_model,
        k = spec.num_speculative_tokens,
        n_tokens = config.max_tokens,
        seed,
        ?device,
        "starting comparison"
    );

    if spec.is_self_draft() {
        warn!(model = %spec.draft_model, "draft and target are the same checkpoint");
    }

    let (draft, _) = load_scorer(spec.draft_model, &spec.revision, &config.sampling, &device)?;
    let (target, files) = load_scorer(spec.target_model, &spec.revision, &config.sampling, &device)?;
    let generator = TextGenerator::from_file(&files.tokenizer)?;

    let mut autoregressive = AutoregressiveDecoder::with_seed(target, seed);
    let baseline = generator.generate_autoregressive(&mut autoregressive, &args.prompt, config.max_tokens)?;
    report("Autoregressive decoding", &baseline);

    let target = autoregressive.into_model();
    let mut speculative = SpeculativeDecoder::with_seed(draft, target, spec.clone(), seed)?;
    let output = generator.generate_speculative(&mut speculative, &args.prompt, config.max_tokens)?;
    report("Speculative decoding", &output);

    let stats = &output.stats;
    println!("\nSpeedup: {:.2}x", baseline.elapsed.as_secs_f64() / output.elapsed.as_secs_f64().max(f64::EPSILON));
    println!(
        "Target calls: {} (autoregressive) vs {} (speculative)",
        baseline.stats.target_calls, stats.target_calls
    );
    match stats.acceptance_rate() {
        Some(rate) => println!("Acceptance rate (accepted / drafted): {rate:.3}"),
        None => println!("Acceptance rate (accepted / drafted): n/a, nothing drafted"),
    }
    println!(
        "Tokens per iteration (incl. resampled and bonus): {:.3}",
        stats.tokens_per_iteration()
    );

    Ok(())
}
