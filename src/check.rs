use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, bail};
use clap::Parser;
use log::info;
use serde::Serialize;
use spmc_core::{CheckOptions, Model, ModelChecker, Property, Scheduler, parse_properties};

use crate::{
    progress::Bar,
    report::{PropertyReport, Report, SchedulerReport},
};

const NO_PROPS_ERR: &str = "no property to check.\n
Examples:
'spmc PATH/TO/MODEL.tra check PROPERTY' checks the given property
'spmc PATH/TO/MODEL.tra check --file PATH/TO/PROPERTIES' checks all properties in the file, separated by ';'";

/// Check properties of the model
#[derive(Debug, Clone, Parser)]
#[deny(missing_docs)]
pub(crate) struct CheckArgs {
    /// Properties to check.
    ///
    /// Multiple properties can be given as separate arguments,
    /// or in a single argument separated by ';'.
    pub(crate) properties: Vec<String>,
    /// File with properties to check, separated by ';'.
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub(crate) file: Option<PathBuf>,
    /// Convergence threshold of value iteration.
    #[arg(short, long, default_value_t = 1e-6)]
    pub(crate) precision: f64,
    /// Use an absolute convergence criterion.
    ///
    /// By default, the precision is relative to the computed values.
    #[arg(long)]
    pub(crate) absolute: bool,
    /// Max number of iterations of value iteration.
    ///
    /// When reached before convergence, SPMC warns and reports the values computed so far.
    #[arg(long, default_value_t = 1_000_000)]
    pub(crate) max_iterations: usize,
    /// Run the value iteration on a single thread.
    #[arg(long)]
    pub(crate) single_thread: bool,
    /// Extract an optimal scheduler for each property.
    ///
    /// Checking fails if a scheduler cannot be extracted,
    /// e.g., for deterministic models or properties that are not probability or reward operators.
    #[arg(short = 's', long)]
    pub(crate) extract_scheduler: bool,
    /// Save the extracted schedulers in JSON format into the given directory.
    #[arg(long, requires = "extract_scheduler", value_hint = clap::ValueHint::DirPath)]
    pub(crate) export_scheduler: Option<PathBuf>,
}

impl CheckArgs {
    pub(crate) fn options(&self) -> CheckOptions {
        CheckOptions {
            precision: self.precision,
            relative: !self.absolute,
            max_iterations: self.max_iterations,
            extract_scheduler: self.extract_scheduler,
            single_thread: self.single_thread,
        }
    }

    /// Parses the properties given as arguments and in the property file, in this order.
    pub(crate) fn properties(&self) -> anyhow::Result<Vec<Property>> {
        let mut properties = Vec::new();
        for input in &self.properties {
            properties.extend(
                parse_properties(input)
                    .with_context(|| format!("failed to parse property '{input}'"))?,
            );
        }
        if let Some(path) = &self.file {
            info!(target: "parser", "parsing property file '{}'", path.display());
            let input = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read file '{}' to string", path.display()))?;
            properties.extend(parse_properties(&input).with_context(|| {
                format!("failed to parse properties in '{}'", path.display())
            })?);
        }
        if properties.is_empty() {
            bail!(NO_PROPS_ERR);
        }
        Ok(properties)
    }

    pub(crate) fn check(
        &self,
        model_name: String,
        model: &Model,
        progress: Option<Bar>,
    ) -> anyhow::Result<Report> {
        let properties = self.properties()?;
        let options = self.options();
        let checker = ModelChecker::new(model, options);
        if let Some(dir) = &self.export_scheduler {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory '{}'", dir.display()))?;
        }
        let bar = progress.map(|bar| bar.property_bar(&model_name, properties.len()));

        let mut reports = Vec::with_capacity(properties.len());
        for (index, property) in properties.iter().enumerate() {
            if let Some(bar) = &bar {
                bar.set_message(property.to_string());
            }
            let time = Instant::now();
            let mut result = checker
                .check(property)
                .with_context(|| format!("failed to check property {property}"))?;
            let elapsed = time.elapsed();
            let scheduler = if self.extract_scheduler {
                let Some(scheduler) = result.take_scheduler() else {
                    bail!("no scheduler was extracted for property {property}");
                };
                let file = self
                    .export_scheduler
                    .as_deref()
                    .map(|dir| export_scheduler(dir, index, property, &scheduler, model))
                    .transpose()?;
                Some(SchedulerReport {
                    memoryless: scheduler.is_memoryless(),
                    memory: scheduler.memory_size(),
                    file,
                })
            } else {
                None
            };
            reports.push(PropertyReport::new(property, &result, elapsed, scheduler));
            if let Some(bar) = &bar {
                bar.inc(1);
            }
        }
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }

        Ok(Report {
            model: model_name,
            precision: self.precision,
            relative: !self.absolute,
            properties: reports,
        })
    }
}

#[derive(Serialize)]
struct ExportedScheduler<'a> {
    property: String,
    memoryless: bool,
    /// Choices for each step; a single step for memoryless schedulers.
    steps: Vec<Vec<ExportedChoice<'a>>>,
}

#[derive(Serialize)]
struct ExportedChoice<'a> {
    state: usize,
    choice: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
}

fn export_scheduler(
    dir: &Path,
    index: usize,
    property: &Property,
    scheduler: &Scheduler,
    model: &Model,
) -> anyhow::Result<PathBuf> {
    let choices = |choices: &[usize]| {
        choices
            .iter()
            .enumerate()
            .map(|(state, &choice)| ExportedChoice {
                state,
                choice,
                action: model.choice_label(state, choice),
            })
            .collect::<Vec<_>>()
    };
    let steps = match scheduler {
        Scheduler::Memoryless(memoryless) => vec![choices(memoryless.as_slice())],
        Scheduler::StepDependent(steps) => steps
            .iter()
            .map(|step| choices(step.as_slice()))
            .collect(),
    };
    let exported = ExportedScheduler {
        property: property.to_string(),
        memoryless: scheduler.is_memoryless(),
        steps,
    };
    let name = property
        .name
        .as_deref()
        .filter(|name| {
            name.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
        .map_or_else(|| format!("scheduler_{index}"), |name| format!("scheduler_{name}"));
    let path = dir.join(name).with_extension("json");
    let file =
        File::create(&path).with_context(|| format!("failed to create file '{}'", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &exported)
        .with_context(|| format!("failed to write scheduler to '{}'", path.display()))?;
    info!("scheduler saved to '{}'", path.display());
    Ok(path)
}
