use crate::Command;
use anyhow::{Context, Result};
use behex_core::AssetResolver;
use behex_experiment::participant::RandomParticipant;
use behex_experiment::reward::clock::{curves_to_csv, reward_curve, ClockCondition};
use behex_experiment::sequence::SequenceGenerator;
use behex_experiment::{
    build_task, ExperimentConfig, ExperimentRunner, JsonlSink, LocalHost, RunSummary, TaskKind,
};
use behex_timing::{HighPrecisionTimer, Timer, VirtualTimer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::info;

pub struct App {
    command: Command,
}

struct RunOptions {
    config: ExperimentConfig,
    seed: Option<u64>,
    realtime: bool,
    accuracy: f64,
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    }
}

impl App {
    pub fn new(command: Command) -> Result<Self> {
        Ok(Self { command })
    }

    pub fn run(self) -> Result<()> {
        match self.command {
            Command::Run {
                task,
                config,
                seed,
                out,
                realtime,
                accuracy,
            } => {
                let config = Self::load_config(config, task, out)?;
                let summary = Self::run_session(RunOptions {
                    config,
                    seed,
                    realtime,
                    accuracy,
                })?;
                let json = serde_json::json!({
                    "subject_nr": summary.subject_nr,
                    "task": summary.task,
                    "trials": summary.trials,
                    "score": summary.score,
                    "elapsed_ms": summary.elapsed_ms,
                });
                println!("{json}");
            }
            Command::Sequence {
                switches,
                count,
                length,
                seed,
            } => {
                let generator = SequenceGenerator::new(length)?;
                let mut rng = rng_from(seed);
                for _ in 0..count {
                    let seq = generator.generate(switches, &mut rng)?;
                    let digits: String = seq.iter().map(|d| char::from(b'0' + d)).collect();
                    println!("{digits}");
                }
            }
            Command::Curves { condition } => {
                let conditions = match condition {
                    Some(c) => vec![c.parse::<ClockCondition>()?],
                    None => ClockCondition::ALL.to_vec(),
                };
                let mut rows = Vec::new();
                for c in conditions {
                    rows.extend(reward_curve(c)?);
                }
                print!("{}", curves_to_csv(&rows));
            }
        }
        Ok(())
    }

    fn load_config(path: Option<PathBuf>, task: Option<String>, out: Option<PathBuf>) -> Result<ExperimentConfig> {
        let mut config = match &path {
            Some(p) => ExperimentConfig::load(p).with_context(|| format!("loading config {}", p.display()))?,
            None => ExperimentConfig::default(),
        };
        if let Some(t) = task {
            config.task = t.parse::<TaskKind>()?;
        }
        if let Some(dir) = out {
            config.subject.data_dir = dir;
        }
        config.validate()?;
        Ok(config)
    }

    fn run_session(opts: RunOptions) -> Result<RunSummary> {
        if opts.realtime {
            Self::run_with(opts, HighPrecisionTimer::new())
        } else {
            Self::run_with(opts, VirtualTimer::new())
        }
    }

    fn run_with<T: Timer>(opts: RunOptions, timer: T) -> Result<RunSummary> {
        let RunOptions {
            config,
            seed,
            accuracy,
            ..
        } = opts;
        let mut rng = rng_from(seed);
        let task = build_task(&config, &mut rng).context("building task")?;
        let subject = &config.subject;
        let host = LocalHost::new(&subject.data_dir, subject.manipulations.clone());
        let mut runner = ExperimentRunner::new(
            task,
            AssetResolver::new(subject.asset_base.as_str()),
            Box::new(host),
            timer,
            rng,
            subject.end_url.as_str(),
        );
        let mut sink = JsonlSink::create(&subject.data_dir, runner.subject_nr())
            .with_context(|| format!("opening data file in {}", subject.data_dir.display()))?;
        info!(path = %sink.path().display(), task = %config.task, "logging trials");

        let mut participant = RandomParticipant {
            accuracy,
            ..RandomParticipant::default()
        };
        let summary = runner.run(&mut participant, &mut sink)?;
        info!(trials = summary.trials, score = summary.score, "session complete");
        Ok(summary)
    }
}
