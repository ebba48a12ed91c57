use crate::core::io::traits::TextFile;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Control template has no '{marker}' line to anchor the cluster count")]
    MissingMarker { marker: String },
    #[error("Cluster count must be at least 1")]
    InvalidClusterCount,
    #[error("Line {line}: '{keyword}' needs a trailing integer value, found '{value}'")]
    InvalidRescaleValue {
        line: usize,
        keyword: String,
        value: String,
    },
}

/// The lines of a docking control file (`INDOCK`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFile {
    pub lines: Vec<String>,
}

impl TextFile for ControlFile {
    type Error = TemplateError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self, Self::Error> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
        Ok(Self { lines })
    }

    fn write_to(&self, writer: &mut impl Write) -> Result<(), Self::Error> {
        for line in &self.lines {
            writeln!(writer, "{}", line)?;
        }
        Ok(())
    }
}

/// Describes how a control file template is specialised for one cluster count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlTemplate {
    /// Lines containing this keyword have their trailing integer divided by k.
    pub rescale_keyword: String,
    /// The cluster-count line is inserted right after the first line containing this.
    pub marker_keyword: String,
    pub parameter_name: String,
    pub padding: usize,
}

impl Default for ControlTemplate {
    fn default() -> Self {
        Self {
            rescale_keyword: "match_goal".to_string(),
            marker_keyword: "bump_rigid".to_string(),
            parameter_name: "k_clusters".to_string(),
            padding: 20,
        }
    }
}

impl ControlTemplate {
    /// The injected line declaring the cluster count.
    pub fn cluster_line(&self, k: usize) -> String {
        format!("{}{}{}", self.parameter_name, " ".repeat(self.padding), k)
    }

    /// Produces the control file for a job with `k` sphere clusters.
    ///
    /// The output always has exactly one line more than the template.
    pub fn apply(
        &self,
        template: &ControlFile,
        k: usize,
        rescale: bool,
    ) -> Result<ControlFile, TemplateError> {
        if k == 0 {
            return Err(TemplateError::InvalidClusterCount);
        }

        let mut lines = Vec::with_capacity(template.lines.len() + 1);
        let mut inserted = false;

        for (line_num, line) in template.lines.iter().enumerate() {
            let line = if rescale && line.contains(&self.rescale_keyword) {
                self.rescale_line(line, k, line_num + 1)?
            } else {
                line.clone()
            };
            let is_marker = !inserted && line.contains(&self.marker_keyword);
            lines.push(line);

            if is_marker {
                lines.push(self.cluster_line(k));
                inserted = true;
            }
        }

        if !inserted {
            return Err(TemplateError::MissingMarker {
                marker: self.marker_keyword.clone(),
            });
        }
        Ok(ControlFile { lines })
    }

    fn rescale_line(&self, line: &str, k: usize, line_num: usize) -> Result<String, TemplateError> {
        let trimmed = line.trim_end();
        let (head, token) = match trimmed.rfind(char::is_whitespace) {
            Some(pos) => trimmed.split_at(pos + 1),
            None => ("", trimmed),
        };

        let value: i64 = token.parse().map_err(|_| TemplateError::InvalidRescaleValue {
            line: line_num,
            keyword: self.rescale_keyword.clone(),
            value: token.to_string(),
        })?;
        let scaled = value.div_euclid(k as i64);

        Ok(format!("{head}{scaled}{}", &line[trimmed.len()..]))
    }
}
