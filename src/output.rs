use crate::error::Result;
use crate::github::UserProfile;
use serde::Deserialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// Streams member records to a writer, one flushed record at a time.
pub enum RecordWriter<W: Write> {
    Csv {
        writer: csv::Writer<W>,
        with_name: bool,
    },
    /// Newline-delimited JSON, one object per member.
    Json(W),
}

impl<W: Write> RecordWriter<W> {
    pub fn new(out: W, format: OutputFormat, with_name: bool) -> Self {
        match format {
            OutputFormat::Csv => RecordWriter::Csv {
                writer: csv::WriterBuilder::new().has_headers(false).from_writer(out),
                with_name,
            },
            OutputFormat::Json => RecordWriter::Json(out),
        }
    }

    /// CSV gets `login` or `login,name`; JSON has no header.
    pub fn write_header(&mut self) -> Result<()> {
        if let RecordWriter::Csv { writer, with_name } = self {
            if *with_name {
                writer.write_record(["login", "name"])?;
            } else {
                writer.write_record(["login"])?;
            }
            writer.flush()?;
        }
        Ok(())
    }

    pub fn write(&mut self, user: &UserProfile) -> Result<()> {
        match self {
            RecordWriter::Csv { writer, with_name } => {
                if *with_name {
                    writer.write_record([user.login.as_str(), user.display_name()])?;
                } else {
                    writer.write_record([user.login.as_str()])?;
                }
                writer.flush()?;
            }
            RecordWriter::Json(out) => {
                let mut line = serde_json::to_vec(user)?;
                line.push(b'\n');
                out.write_all(&line)?;
                out.flush()?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        match self {
            RecordWriter::Csv { writer, .. } => writer.flush()?,
            RecordWriter::Json(out) => out.flush()?,
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        match self {
            RecordWriter::Csv { writer, .. } => match writer.into_inner() {
                Ok(out) => out,
                Err(_) => panic!("csv writer failed to flush"),
            },
            RecordWriter::Json(out) => out,
        }
    }
}
