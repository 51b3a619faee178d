use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use fast_stt::config::{load_or_default, save_config, AppConfig};
use fast_stt::logging::setup_logging;
use fast_stt::types::{
    default_model, language_code_from_label, resolve_model, ComputeType, Device, JobParameters,
    MODEL_CATALOG,
};
use fast_stt::worker::{reap_stray_instances, StrayMatcher, SystemProcessTable};
use fast_stt::{ControlChannel, Controller, JobOutcome};
use log::LevelFilter;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "fast_stt", version, about = "Transcribe audio through the FastSTT worker")]
struct Cli {
    /// Configuration file (JSON). Missing file means defaults.
    #[arg(long, global = true, default_value = "faststt.json")]
    config: PathBuf,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transcribe one audio file.
    Transcribe(TranscribeArgs),
    /// Kill leftover worker and transcoder processes.
    Reap,
    /// Delete every message from the channel directory.
    Purge,
    /// List the available models.
    Models,
    /// Write a configuration file with the default settings.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct TranscribeArgs {
    input: PathBuf,
    output: PathBuf,

    /// Model id or label (see `models`). Defaults to the largest model.
    #[arg(long)]
    model: Option<String>,

    /// Run on the GPU.
    #[arg(long)]
    cuda: bool,

    /// Full precision instead of int8 quantization.
    #[arg(long)]
    high_precision: bool,

    /// Language code or label, e.g. `en` or "English (en)".
    #[arg(long, default_value = "en")]
    language: String,

    /// Let the worker detect the spoken language.
    #[arg(long)]
    auto_detect: bool,

    /// Ask the worker to include timings in the transcription.
    #[arg(long)]
    report_timings: bool,

    #[arg(long, default_value_t = fast_stt::types::params::DEFAULT_PRECISION_LEVEL)]
    precision_level: u8,
}

impl TranscribeArgs {
    fn parameters(&self) -> anyhow::Result<JobParameters> {
        let model = match &self.model {
            Some(query) => resolve_model(query)
                .ok_or_else(|| anyhow!("unknown model '{query}' (run `fast_stt models`)"))?,
            None => default_model(),
        };
        let language = language_code_from_label(&self.language)
            .ok_or_else(|| anyhow!("cannot read a language code from '{}'", self.language))?;

        let device = if self.cuda { Device::Cuda } else { Device::Cpu };
        Ok(JobParameters::new(model.id, device, ComputeType::for_device(device, self.high_precision))
            .with_language(language)
            .with_auto_detect(self.auto_detect)
            .with_report_timings(self.report_timings)
            .with_precision_level(self.precision_level))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_or_default(&cli.config)?;

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = setup_logging(&config.log_dir, level) {
        eprintln!("Failed to set up logging: {e}");
    }

    match cli.command {
        Command::Transcribe(args) => transcribe(config, args).await,
        Command::Reap => {
            let matcher = StrayMatcher::from_config(&config.reaper);
            let report = reap_stray_instances(&mut SystemProcessTable::new(), &matcher);
            println!("Killed {} stray process(es)", report.killed.len());
            Ok(ExitCode::SUCCESS)
        }
        Command::Purge => {
            ControlChannel::open(&config.runtime_dir)?.purge()?;
            println!("Purged {}", config.runtime_dir.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Models => {
            for model in MODEL_CATALOG {
                println!("{:<10} {}", model.id, model.label);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::InitConfig { force } => {
            if cli.config.exists() && !force {
                bail!("{} already exists (use --force)", cli.config.display());
            }
            save_config(&cli.config, &AppConfig::default())?;
            println!("Wrote {}", cli.config.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn transcribe(config: AppConfig, args: TranscribeArgs) -> anyhow::Result<ExitCode> {
    let params = args.parameters()?;
    let cancel = CancellationToken::new();

    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling");
            on_ctrl_c.cancel();
        }
    });

    // The controller blocks while polling the channel.
    let outcome = tokio::task::spawn_blocking(move || {
        let mut controller = Controller::start_session(&config, &cancel)?;
        let outcome = controller.submit_job(&args.input, &args.output, &params, &cancel);
        controller.end_session();
        outcome
    })
    .await
    .context("transcription task panicked")??;

    match outcome {
        JobOutcome::Completed(path) => {
            println!("Successfully generated your transcription: {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        JobOutcome::Failed { reason } => {
            eprintln!(
                "The worker could not transcribe the file{}",
                reason.map(|r| format!(": {r}")).unwrap_or_default()
            );
            Ok(ExitCode::from(2))
        }
    }
}
