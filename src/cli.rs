use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dimse::{
    AeTitle, DimseScu, QueryCriteria, QueryMatch, RemoteNode, ScuBuilder, ServiceResult,
    TransferProgress,
};
use serde::Serialize;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "pacsbridge",
    version,
    about = "Query, retrieve and send studies to a PACS"
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Calling AE title, overrides the configured one
    #[arg(long, global = true)]
    pub aet: Option<String>,

    /// Per-exchange timeout in seconds (0 waits forever)
    #[arg(short, long, global = true)]
    pub timeout: Option<u32>,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Verify connectivity (C-ECHO)
    Echo {
        /// Remote node as AET@host:port
        node: RemoteNode,
    },
    /// Search studies (C-FIND)
    Find {
        node: RemoteNode,
        #[arg(long)]
        patient_id: Option<String>,
        #[arg(long)]
        patient_name: Option<String>,
        #[arg(long)]
        study_uid: Option<String>,
        /// Date or range, e.g. 20240101-20240131
        #[arg(long)]
        study_date: Option<String>,
        #[arg(long)]
        accession: Option<String>,
        #[arg(long)]
        modality: Option<String>,
    },
    /// Retrieve a study to this AE (C-MOVE)
    Move {
        node: RemoteNode,
        study_uid: String,
        /// Folder the local store service writes into
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,
    },
    /// Send DICOM files (C-STORE)
    Store {
        node: RemoteNode,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// One JSON line on stdout
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event<'a> {
    Match(&'a QueryMatch),
    Progress(&'a TransferProgress),
    Result(&'a ServiceResult),
}

impl Cli {
    /// Apply command line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(aet) = &self.aet {
            config.scu.local_aet = AeTitle::new(aet).context("invalid --aet")?;
        }
        if let Some(timeout) = self.timeout {
            config.scu.timeout_seconds = timeout;
        }
        Ok(())
    }
}

/// Execute the selected command, streaming events to `out` as JSON lines.
pub fn run(cli: &Cli, config: &Config, out: &mut dyn Write) -> anyhow::Result<ServiceResult> {
    let scu = ScuBuilder::new().max_pdu(config.scu.max_pdu).build()?;
    execute(&scu, cli, config, out)
}

/// Like [`run`], over a caller-provided SCU.
pub fn execute(
    scu: &DimseScu,
    cli: &Cli,
    config: &Config,
    out: &mut dyn Write,
) -> anyhow::Result<ServiceResult> {
    let local = &config.scu.local_aet;
    let timeout = config.scu.timeout_seconds;
    let mut sink = JsonLines::new(out);

    let result = match &cli.cmd {
        Cmd::Echo { node } => scu.echo(local, node, timeout),
        Cmd::Find {
            node,
            patient_id,
            patient_name,
            study_uid,
            study_date,
            accession,
            modality,
        } => {
            let criteria = QueryCriteria {
                patient_id: patient_id.clone(),
                patient_name: patient_name.clone(),
                study_instance_uid: study_uid.clone(),
                study_date: study_date.clone(),
                accession_number: accession.clone(),
                modality: modality.clone(),
            };
            scu.find(local, node, &criteria, |m| sink.emit(&Event::Match(&m)), timeout)
        }
        Cmd::Move {
            node,
            study_uid,
            dest,
        } => scu.move_study(
            local,
            node,
            study_uid,
            dest,
            |p| sink.emit(&Event::Progress(&p)),
            timeout,
        ),
        Cmd::Store { node, files } => {
            scu.store(local, node, files, |p| sink.emit(&Event::Progress(&p)), timeout)
        }
    };

    sink.emit(&Event::Result(&result));
    sink.finish()?;
    Ok(result)
}

/// Writes events, keeping the first write error for later.
struct JsonLines<'w> {
    out: &'w mut dyn Write,
    error: Option<anyhow::Error>,
}

impl<'w> JsonLines<'w> {
    fn new(out: &'w mut dyn Write) -> Self {
        Self { out, error: None }
    }

    fn emit(&mut self, event: &Event<'_>) {
        if self.error.is_some() {
            return;
        }
        let written = serde_json::to_writer(&mut *self.out, event)
            .map_err(anyhow::Error::from)
            .and_then(|_| writeln!(self.out).map_err(anyhow::Error::from));
        if let Err(e) = written {
            self.error = Some(e.context("cannot write output"));
        }
    }

    fn finish(self) -> anyhow::Result<()> {
        match self.error {
            Some(e) => Err(e),
            None => self.out.flush().context("cannot flush output"),
        }
    }
}
