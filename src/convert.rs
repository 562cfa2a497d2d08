/*! LaTeX to XML conversion

Each preprint is converted by an external tool (`latexmlc` by default) run as a subprocess:

```sh
latexmlc --timeout=240 --dest=xml/<id>.xml latex/<archive-id>/<id>/<preprint>.tex
```

The standard error of the tool is written to `logs/<id>.txt`, on every attempt.
That file is also the marker that an attempt has been made: preprints having one are not converted again.
Conversions that exceed the timeout are killed and recorded in `logs/failed_conversions.txt`.
!*/
use std::fs::File;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use wait_timeout::ChildExt;

use crate::cancel::CancelToken;
use crate::config::{ConvertConfig, Layout};
use crate::error::Error;
use crate::io::Registry;
use crate::preprint::Preprint;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Outcome of a single conversion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionOutcome {
    Success,
    /// Killed after exceeding the timeout.
    Timeout,
    /// The tool exited with a non-zero status (`None` if killed by a signal).
    Failed(Option<i32>),
}

/// Counters over a batch of conversions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConversionStats {
    pub succeeded: usize,
    pub timed_out: usize,
    pub failed: usize,
    /// Preprints that already had an output or a log.
    pub skipped: usize,
}

impl ConversionStats {
    pub fn add(&mut self, outcome: ConversionOutcome) {
        match outcome {
            ConversionOutcome::Success => self.succeeded += 1,
            ConversionOutcome::Timeout => self.timed_out += 1,
            ConversionOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.succeeded += other.succeeded;
        self.timed_out += other.timed_out;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self
    }
}

pub struct Converter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    layout: Layout,
    failures: Registry,
    cancel: CancelToken,
}

impl Converter {
    /// Create a converter writing into `layout`, creating the output directories if needed.
    pub fn new(config: &ConvertConfig, layout: &Layout, cancel: CancelToken) -> Result<Self, Error> {
        std::fs::create_dir_all(layout.xml_dir())?;
        std::fs::create_dir_all(layout.logs_dir())?;
        let failures = Registry::open(&layout.failed_conversions())?;

        Ok(Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: config.timeout(),
            layout: layout.clone(),
            failures,
            cancel,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Registry of timed out conversions.
    pub fn failures(&self) -> &Registry {
        &self.failures
    }

    pub fn output_path(&self, preprint: &Preprint) -> PathBuf {
        self.layout.xml_path(&preprint.submission_id)
    }

    /// `false` if the preprint has already been converted, or if a conversion has been attempted.
    pub fn needs_conversion(&self, preprint: &Preprint) -> bool {
        !self.layout.xml_path(&preprint.submission_id).is_file()
            && !self.layout.conversion_log(&preprint.submission_id).is_file()
    }

    /// Run the conversion tool on `preprint`.
    ///
    /// Tool failures and timeouts are outcomes, not errors.
    /// On interrupt, the child is killed and its log is removed so that the preprint
    /// is attempted again on the next run, then [Error::Interrupted] is returned.
    pub fn convert(&self, preprint: &Preprint) -> Result<ConversionOutcome, Error> {
        let id = &preprint.submission_id;
        let out = self.layout.xml_path(id);
        let log_path = self.layout.conversion_log(id);

        debug!("converting {:?} to {:?}", preprint.path, out);
        let logfile = File::create(&log_path)?;

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(format!("--dest={}", out.display()))
            .arg(&preprint.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(logfile))
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                // the tool could not run at all: don't leave a skip marker behind
                let _ = std::fs::remove_file(&log_path);
                error!("could not run {}: {}", self.program, e);
                return Err(e.into());
            }
        };

        let start = Instant::now();
        let status = loop {
            if let Some(status) = child.wait_timeout(POLL_INTERVAL.min(self.timeout))? {
                break status;
            }

            if self.cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return self.rollback(preprint);
            }

            if start.elapsed() >= self.timeout {
                // the tool can recurse forever and eat up memory
                let _ = child.kill();
                let _ = child.wait();
                error!("conversion of {} timed out after {:?}", id, self.timeout);
                self.failures.record(id)?;
                return Ok(ConversionOutcome::Timeout);
            }
        };

        // the tool usually gets the operator's SIGINT too, and exits on its own
        if self.cancel.is_cancelled() {
            return self.rollback(preprint);
        }

        if status.success() {
            info!("converted {} in {:?}", id, start.elapsed());
            Ok(ConversionOutcome::Success)
        } else {
            warn!(
                "conversion of {} failed ({}), see {:?}",
                id, status, log_path
            );
            Ok(ConversionOutcome::Failed(status.code()))
        }
    }

    /// Remove the log and output of an interrupted conversion, so that it is attempted again.
    fn rollback(&self, preprint: &Preprint) -> Result<ConversionOutcome, Error> {
        let id = &preprint.submission_id;
        let log_path = self.layout.conversion_log(id);
        let out = self.layout.xml_path(id);
        warn!("interrupted conversion of {}, removing {:?}", id, log_path);
        if log_path.is_file() {
            std::fs::remove_file(&log_path)?;
        }
        if out.is_file() {
            std::fs::remove_file(&out)?;
        }
        Err(Error::Interrupted)
    }

    /// Sequentially convert the preprints that need it.
    pub fn convert_all(&self, preprints: &[Preprint]) -> Result<ConversionStats, Error> {
        let mut stats = ConversionStats::default();
        for preprint in preprints {
            self.cancel.check()?;
            if !self.needs_conversion(preprint) {
                stats.skipped += 1;
                continue;
            }
            stats.add(self.convert(preprint)?);
        }
        Ok(stats)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn setup(program: &str, args: &[&str], timeout: Duration) -> (tempfile::TempDir, Converter, Preprint) {
        let root = tempfile::tempdir().unwrap();
        let layout = Layout::new(root.path());
        let config = ConvertConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout_secs: 0,
        };
        let mut converter = Converter::new(&config, &layout, CancelToken::new()).unwrap();
        converter.timeout = timeout;

        let src = root.path().join("latex/arch/1009.1724");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("ms.tex"), "\\documentclass{article}").unwrap();
        let preprint = Preprint {
            submission_id: "1009.1724".to_string(),
            path: src.join("ms.tex"),
        };
        (root, converter, preprint)
    }

    #[test]
    fn success_writes_output_and_log() {
        // `sh -c script $0 $1`: $0 is --dest=..., $1 is the input
        let (_root, converter, preprint) = setup(
            "sh",
            &["-c", "echo warning >&2; cp \"$1\" \"${0#--dest=}\""],
            Duration::from_secs(10),
        );

        assert!(converter.needs_conversion(&preprint));
        let outcome = converter.convert(&preprint).unwrap();
        assert_eq!(outcome, ConversionOutcome::Success);

        let out = converter.output_path(&preprint);
        assert!(out.is_file());
        let log = std::fs::read_to_string(converter.layout.conversion_log("1009.1724")).unwrap();
        assert_eq!(log.trim(), "warning");
        assert!(!converter.needs_conversion(&preprint));
    }

    #[test]
    fn tool_error_is_an_outcome() {
        let (_root, converter, preprint) =
            setup("sh", &["-c", "echo broken >&2; exit 3"], Duration::from_secs(10));

        let outcome = converter.convert(&preprint).unwrap();
        assert_eq!(outcome, ConversionOutcome::Failed(Some(3)));
        assert!(converter.layout.conversion_log("1009.1724").is_file());
        assert!(converter.failures().is_empty());

        // the log prevents another attempt
        let stats = converter.convert_all(&[preprint]).unwrap();
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn missing_tool_leaves_no_marker() {
        let (_root, converter, preprint) =
            setup("/nonexistent/latexmlc", &[], Duration::from_secs(10));

        assert!(converter.convert(&preprint).is_err());
        assert!(converter.needs_conversion(&preprint));
    }

    #[test]
    fn timeout_is_recorded_once() {
        let (_root, converter, preprint) =
            setup("sh", &["-c", "sleep 30"], Duration::from_secs(1));

        let start = Instant::now();
        let outcome = converter.convert(&preprint).unwrap();
        assert_eq!(outcome, ConversionOutcome::Timeout);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(converter.failures().contains("1009.1724"));

        // a rerun skips the preprint and doesn't record it again
        let stats = converter.convert_all(&[preprint]).unwrap();
        assert_eq!(stats.skipped, 1);
        let failed = std::fs::read_to_string(converter.layout.failed_conversions()).unwrap();
        assert_eq!(failed.lines().filter(|l| *l == "1009.1724").count(), 1);
    }

    #[test]
    fn tool_killed_by_interrupt_removes_log() {
        // the tool exits right after the token is set, as it does on a shared SIGINT
        let root = tempfile::tempdir().unwrap();
        let flag = root.path().join("interrupted");
        let script = format!(
            "while [ ! -f {} ]; do sleep 0.01; done; kill -INT $$",
            flag.display()
        );
        let (_dir, converter, preprint) = setup("sh", &["-c", &script], Duration::from_secs(60));

        let cancel = converter.cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            cancel.cancel();
            std::fs::write(flag, "").unwrap();
        });

        assert!(matches!(converter.convert(&preprint), Err(Error::Interrupted)));
        canceller.join().unwrap();
        assert!(!converter.layout.conversion_log("1009.1724").exists());
        assert!(converter.needs_conversion(&preprint));
        assert!(converter.failures().is_empty());
    }

    #[test]
    fn interrupt_removes_log() {
        let (_root, converter, preprint) = setup("sh", &["-c", "sleep 30"], Duration::from_secs(60));
        converter.cancel.cancel();

        let start = Instant::now();
        assert!(matches!(converter.convert(&preprint), Err(Error::Interrupted)));
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(converter.needs_conversion(&preprint));
    }
}
