use anyhow::Context;
use serde::Serialize;
use spmc_core::{CheckResult, Property, Value};
use std::{fmt::Display, path::PathBuf, time::Duration};

#[derive(Serialize)]
pub(crate) struct Report {
    pub(crate) model: String,
    pub(crate) precision: f64,
    pub(crate) relative: bool,
    pub(crate) properties: Vec<PropertyReport>,
}

#[derive(Serialize)]
pub(crate) struct PropertyReport {
    property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    /// Value in each initial state.
    values: Vec<ReportValue>,
    summary: String,
    time: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheduler: Option<SchedulerReport>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ReportValue {
    Number(f64),
    Truth(bool),
}

#[derive(Serialize)]
pub(crate) struct SchedulerReport {
    pub(crate) memoryless: bool,
    pub(crate) memory: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) file: Option<PathBuf>,
}

impl PropertyReport {
    pub(crate) fn new(
        property: &Property,
        result: &CheckResult,
        time: Duration,
        scheduler: Option<SchedulerReport>,
    ) -> Self {
        let values = result
            .initial_values()
            .into_iter()
            .map(|value| match value {
                Value::Number(number) => ReportValue::Number(number),
                Value::Truth(truth) => ReportValue::Truth(truth),
            })
            .collect();
        Self {
            property: property.formula.to_string(),
            name: property.name.clone(),
            values,
            summary: result.to_string(),
            time,
            scheduler,
        }
    }
}

impl Report {
    pub(crate) fn print(&self, json: bool) -> anyhow::Result<()> {
        if json {
            let report =
                serde_json::ser::to_string_pretty(&self).context("failed to serialize report")?;
            println!("{report}");
        } else {
            println!("{self}");
        }
        Ok(())
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let criterion = if self.relative { "relative" } else { "absolute" };
        writeln!(
            f,
            "SPMC results for {} (precision {}, {criterion})",
            self.model, self.precision
        )?;
        for (index, report) in self.properties.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            if let Some(name) = &report.name {
                write!(f, "\"{name}\": ")?;
            }
            write!(
                f,
                "{}: {} (checked in {:.3}s)",
                report.property,
                report.summary,
                report.time.as_secs_f64()
            )?;
            if let Some(scheduler) = &report.scheduler {
                write!(f, "\n  scheduler: ")?;
                if scheduler.memoryless {
                    write!(f, "memoryless")?;
                } else {
                    write!(f, "step-dependent ({} steps)", scheduler.memory)?;
                }
                if let Some(file) = &scheduler.file {
                    write!(f, ", saved to '{}'", file.display())?;
                }
            }
        }
        Ok(())
    }
}
