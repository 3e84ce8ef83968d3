use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::{Context, bail};
use clap::Parser;
use flate2::{Compression, write::GzEncoder};
use log::{debug, error, info, warn};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use spmc_core::{
    CheckOptions, Model, ModelChecker, ModelType, PathOutcome, Scheduler, Simulator, Tracer,
    parse_properties,
};

/// Simulate paths of the model and save them to file in csv format.
#[derive(Debug, Clone, Parser)]
#[deny(missing_docs)]
pub(crate) struct SimulateArgs {
    /// Property whose optimal scheduler resolves the nondeterminism of the model.
    ///
    /// By default, choices are picked uniformly at random.
    pub(crate) property: Option<String>,
    /// Number of paths to simulate.
    #[arg(long, default_value_t = 1)]
    pub(crate) runs: usize,
    /// Max number of steps of each path.
    ///
    /// Paths stop earlier if they reach an absorbing state.
    #[arg(short, long, default_value_t = 1000)]
    pub(crate) steps: usize,
    /// Seed of the random number generator.
    ///
    /// Run i is seeded with SEED + i.
    /// By default, the seed is random and printed in the logs.
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Directory where to save the traces.
    #[arg(short, long, default_value = "traces", value_hint = clap::ValueHint::DirPath)]
    pub(crate) output: PathBuf,
    /// Do not compress the saved traces.
    #[arg(long)]
    pub(crate) uncompressed: bool,
    /// Run the simulations on a single thread.
    ///
    /// By default, SPMC simulates paths in parallel.
    #[arg(long)]
    pub(crate) single_thread: bool,
}

impl SimulateArgs {
    fn scheduler(&self, model: &Model) -> anyhow::Result<Option<Scheduler>> {
        let Some(input) = &self.property else {
            return Ok(None);
        };
        let mut properties =
            parse_properties(input).with_context(|| format!("failed to parse property '{input}'"))?;
        let property = match properties.len() {
            1 => properties.remove(0),
            n => bail!("simulation requires a single property, found {n}"),
        };
        if model.model_type() == ModelType::Dtmc {
            warn!("model is a DTMC, ignoring property {property}");
            return Ok(None);
        }
        let options = CheckOptions {
            extract_scheduler: true,
            single_thread: self.single_thread,
            ..CheckOptions::default()
        };
        let mut result = ModelChecker::new(model, options)
            .check(&property)
            .with_context(|| format!("failed to check property {property}"))?;
        info!("property {property}: {result}");
        result
            .take_scheduler()
            .with_context(|| format!("no scheduler was extracted for property {property}"))
            .map(Some)
    }

    pub(crate) fn simulate(&self, model: &Model) -> anyhow::Result<()> {
        let scheduler = self.scheduler(model)?;
        std::fs::create_dir_all(&self.output)
            .with_context(|| format!("failed to create directory '{}'", self.output.display()))?;
        let seed = self.seed.unwrap_or_else(rand::random);
        info!("simulating {} paths with seed {seed}", self.runs);

        let failed = AtomicBool::new(false);
        let run = |index: usize| {
            let mut simulator = Simulator::new(model, Some(seed.wrapping_add(index as u64)));
            if let Some(scheduler) = &scheduler {
                simulator = simulator.with_scheduler(scheduler);
            }
            let printer = TracePrinter::new(model, self.trace_path(index), &failed);
            match simulator.run(self.steps, printer) {
                PathOutcome::Absorbed(steps) => debug!("run {index} absorbed after {steps} steps"),
                PathOutcome::Truncated => debug!("run {index} truncated"),
            }
        };
        if self.single_thread {
            (0..self.runs).for_each(run);
        } else {
            (0..self.runs).into_par_iter().for_each(run);
        }

        if failed.load(Ordering::Relaxed) {
            bail!("failed to save some traces to '{}'", self.output.display());
        }
        info!("traces saved to '{}'", self.output.display());
        Ok(())
    }

    fn trace_path(&self, run: usize) -> PathBuf {
        let extension = if self.uncompressed { "csv" } else { "csv.gz" };
        self.output.join(format!("trace_{run}.{extension}"))
    }
}

/// Output file of a trace, gzip-compressed or not.
enum TraceFile {
    Compressed(GzEncoder<File>),
    Uncompressed(BufWriter<File>),
}

impl TraceFile {
    fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        if path.extension().is_some_and(|ext| ext == "gz") {
            Ok(TraceFile::Compressed(GzEncoder::new(file, Compression::default())))
        } else {
            Ok(TraceFile::Uncompressed(BufWriter::new(file)))
        }
    }

    /// Flushes the file, completing the gzip stream if compressed.
    fn finish(self) -> std::io::Result<()> {
        match self {
            TraceFile::Compressed(encoder) => encoder.finish().map(drop),
            TraceFile::Uncompressed(mut writer) => writer.flush(),
        }
    }
}

impl Write for TraceFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            TraceFile::Compressed(encoder) => encoder.write(buf),
            TraceFile::Uncompressed(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            TraceFile::Compressed(encoder) => encoder.flush(),
            TraceFile::Uncompressed(writer) => writer.flush(),
        }
    }
}

type TraceWriter = csv::Writer<TraceFile>;

/// Writes a simulated path as csv records `step,state,choice,action,labels`.
struct TracePrinter<'a> {
    model: &'a Model,
    path: PathBuf,
    writer: Option<TraceWriter>,
    failed: &'a AtomicBool,
}

impl<'a> TracePrinter<'a> {
    fn new(model: &'a Model, path: PathBuf, failed: &'a AtomicBool) -> Self {
        Self {
            model,
            path,
            writer: None,
            failed,
        }
    }

    fn fail(&mut self, err: impl std::fmt::Display) {
        error!("failed to write trace '{}': {err}", self.path.display());
        self.failed.store(true, Ordering::Relaxed);
        self.writer = None;
    }
}

impl Tracer for TracePrinter<'_> {
    fn init(&mut self) {
        let result = TraceFile::create(&self.path)
            .map(csv::Writer::from_writer)
            .map_err(csv::Error::from)
            .and_then(|mut writer| {
                writer.write_record(["step", "state", "choice", "action", "labels"])?;
                Ok(writer)
            });
        match result {
            Ok(writer) => self.writer = Some(writer),
            Err(err) => self.fail(err),
        }
    }

    fn trace(&mut self, step: usize, state: usize, choice: Option<usize>) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let action = choice
            .and_then(|choice| self.model.choice_label(state, choice))
            .unwrap_or_default();
        let labels = self.model.labeling().labels_of(state).join(" ");
        let record = [
            step.to_string(),
            state.to_string(),
            choice.map(|choice| choice.to_string()).unwrap_or_default(),
            action.to_owned(),
            labels,
        ];
        if let Err(err) = writer.write_record(&record) {
            self.fail(err);
        }
    }

    fn finalize(mut self, _outcome: &PathOutcome) {
        if let Some(writer) = self.writer.take() {
            let result = writer
                .into_inner()
                .map_err(|err| err.into_error())
                .and_then(TraceFile::finish);
            if let Err(err) = result {
                self.fail(err);
            }
        }
    }
}
