//! User-facing output for conformance runs.
//!
//! Every line goes to a single stream. Only the status tag is colorized.

use std::io::{self, Write};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::outcome::Verdict;
use crate::runner::{ManifestReport, RunReport, SubTestResult, SubTestStatus, Tally};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Pass,
    Fail,
    Skip,
}

impl Tag {
    fn label(self) -> &'static str {
        match self {
            Tag::Pass => "PASS",
            Tag::Fail => "FAIL",
            Tag::Skip => "SKIP",
        }
    }

    fn color(self) -> Color {
        match self {
            Tag::Pass => Color::Green,
            Tag::Fail => Color::Red,
            Tag::Skip => Color::Yellow,
        }
    }
}

/// The tag and message for one sub-test line.
pub fn describe(result: &SubTestResult) -> (Tag, String) {
    match &result.status {
        SubTestStatus::Ran {
            verdict: Verdict::Pass { detail },
            ..
        } => (Tag::Pass, format!("{} : {}", result.file_name, detail)),
        SubTestStatus::Ran {
            verdict: Verdict::Fail(failure),
            ..
        } => (Tag::Fail, format!("{} : {}", result.file_name, failure)),
        SubTestStatus::Skipped { reason } => {
            (Tag::Skip, format!("{} : {}", result.file_name, reason))
        }
    }
}

pub fn manifest_summary(report: &ManifestReport) -> String {
    let tally = report.tally();
    let mut line = format!(
        "{} : {} of {} tests passed",
        report.display_name(),
        tally.passed,
        tally.attempted
    );
    if tally.skipped > 0 {
        line.push_str(&format!(", {} skipped", tally.skipped));
    }
    line
}

/// The final line of a run.
pub fn overall_summary(totals: &Tally, load_errors: usize) -> (Tag, String) {
    let mut message = if totals.failed() > 0 {
        format!("{} of {} tests failed.", totals.failed(), totals.attempted)
    } else {
        format!("{} of {} tests passed.", totals.passed, totals.attempted)
    };
    if load_errors > 0 {
        message.push_str(&format!(" {} manifest(s) could not be loaded.", load_errors));
    }
    let tag = if totals.failed() > 0 || load_errors > 0 {
        Tag::Fail
    } else {
        Tag::Pass
    };
    (tag, message)
}

/// Writes reports to one stream, so results keep their order when stdout
/// and stderr end up in the same place.
pub struct Reporter<W> {
    out: W,
    errors_only: bool,
}

impl Reporter<StandardStream> {
    pub fn stdout(use_colors: bool, errors_only: bool) -> Self {
        let choice = if use_colors {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self::new(StandardStream::stdout(choice), errors_only)
    }
}

impl<W: WriteColor> Reporter<W> {
    pub fn new(out: W, errors_only: bool) -> Self {
        Self { out, errors_only }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn print_run(&mut self, report: &RunReport) -> io::Result<()> {
        for manifest in &report.manifests {
            self.print_manifest(manifest)?;
        }
        if let Some(error) = &report.cleanup_error {
            self.line(Tag::Fail, error)?;
        }
        let (mut tag, mut message) = overall_summary(&report.totals, report.load_errors());
        if report.cleanup_error.is_some() {
            tag = Tag::Fail;
            message.push_str(" Work directory cleanup failed.");
        }
        writeln!(self.out)?;
        write!(self.out, "OVERALL ")?;
        write_tag(&mut self.out, tag)?;
        writeln!(self.out, " : {}", message)
    }

    pub fn print_manifest(&mut self, manifest: &ManifestReport) -> io::Result<()> {
        if let Some(error) = &manifest.load_error {
            self.line(Tag::Fail, &format!("{} : {}", manifest.display_name(), error))?;
            return Ok(());
        }
        for result in &manifest.results {
            let (tag, message) = describe(result);
            self.line(tag, &message)?;
        }
        if !self.errors_only {
            writeln!(self.out, "{}", manifest_summary(manifest))?;
        }
        Ok(())
    }

    fn line(&mut self, tag: Tag, message: &str) -> io::Result<()> {
        if tag != Tag::Fail && self.errors_only {
            return Ok(());
        }
        if tag == Tag::Fail {
            write!(self.out, "  ")?;
        }
        write_tag(&mut self.out, tag)?;
        writeln!(self.out, " : {}", message)
    }
}

fn write_tag<W: WriteColor>(out: &mut W, tag: Tag) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(tag.color())).set_bold(true))?;
    write!(out, "{}", tag.label())?;
    out.reset()
}
