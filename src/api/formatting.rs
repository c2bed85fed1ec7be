//! Output formatting for located sources

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::api::types::LocateResponse;
use crate::core::Degradation;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `lat lon` on one line
    #[default]
    Text,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown output format '{}' (expected text, json or csv)", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        };
        f.write_str(name)
    }
}

/// Short label for a degradation reason
fn degradation_label(degradation: Option<&Degradation>) -> &'static str {
    match degradation {
        None => "none",
        Some(Degradation::ConvergenceFailure { .. }) => "convergence_failure",
        Some(Degradation::Divergence { .. }) => "divergence",
        Some(Degradation::NonFiniteSolution { .. }) => "non_finite_solution",
        Some(Degradation::DegenerateGeometry { .. }) => "degenerate_geometry",
    }
}

/// Plain text output
#[derive(Debug, Clone, Default)]
pub struct TextFormatter {
    /// Append solver diagnostics after the position line
    pub include_diagnostics: bool,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_diagnostics() -> Self {
        Self {
            include_diagnostics: true,
        }
    }

    pub fn format_text(&self, response: &LocateResponse) -> String {
        let mut output = format!("{} {}", response.latitude_deg, response.longitude_deg);
        if !self.include_diagnostics {
            return output;
        }

        let diag = &response.diagnostics;
        output.push_str(&format!("\nconverged:     {}", diag.converged));
        output.push_str(&format!("\niterations:    {}", diag.iterations));
        output.push_str(&format!("\nresidual norm: {:.3e} m", diag.residual_norm));
        if let Some(t) = diag.emission_time {
            output.push_str(&format!("\nemission time: {:.9} s", t));
        }
        if diag.degradation.is_some() {
            output.push_str(&format!(
                "\ndegraded:      {} (nearest receiver used)",
                degradation_label(diag.degradation.as_ref())
            ));
        }
        output
    }
}

/// JSON output
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    pub fn format_json(&self, response: &LocateResponse) -> Result<String, serde_json::Error> {
        if self.pretty {
            serde_json::to_string_pretty(response)
        } else {
            serde_json::to_string(response)
        }
    }
}

/// CSV output, one row per located event
#[derive(Debug, Clone)]
pub struct CsvFormatter {
    pub include_header: bool,
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self { include_header: true }
    }
}

impl CsvFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self) -> &'static str {
        "latitude_deg,longitude_deg,converged,iterations,residual_norm,emission_time,degradation"
    }

    pub fn format_row(&self, response: &LocateResponse) -> String {
        let diag = &response.diagnostics;
        format!(
            "{},{},{},{},{:e},{},{}",
            response.latitude_deg,
            response.longitude_deg,
            diag.converged,
            diag.iterations,
            diag.residual_norm,
            diag.emission_time.map(|t| t.to_string()).unwrap_or_default(),
            degradation_label(diag.degradation.as_ref()),
        )
    }

    pub fn format_csv(&self, responses: &[LocateResponse]) -> String {
        let mut lines = Vec::with_capacity(responses.len() + 1);
        if self.include_header {
            lines.push(self.header().to_string());
        }
        lines.extend(responses.iter().map(|r| self.format_row(r)));
        lines.join("\n")
    }
}

/// Render a single response in `format`
pub fn render(response: &LocateResponse, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(TextFormatter::new().format_text(response)),
        OutputFormat::Json => JsonFormatter::pretty().format_json(response),
        OutputFormat::Csv => Ok(CsvFormatter::new().format_csv(std::slice::from_ref(response))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::Diagnostics;
    use crate::core::{Coordinate2D, ProjectionFrame, SolveMethod};

    fn response(degradation: Option<Degradation>) -> LocateResponse {
        LocateResponse {
            latitude_deg: 38.5,
            longitude_deg: -92.25,
            local: Coordinate2D::new(1.5, -2.0),
            frame: ProjectionFrame::new(38.5),
            diagnostics: Diagnostics {
                converged: degradation.is_none(),
                iterations: 6,
                residual_norm: 1.5e-13,
                emission_time: degradation.is_none().then_some(-0.0001),
                method: SolveMethod::Iterative,
                degradation,
            },
        }
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("CSV".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default().to_string(), "text");
    }

    #[test]
    fn test_text_prints_lat_lon() {
        assert_eq!(TextFormatter::new().format_text(&response(None)), "38.5 -92.25");

        let degraded = response(Some(Degradation::NonFiniteSolution {
            iterations: 6,
            residual_norm: f64::NAN,
        }));
        let text = TextFormatter::with_diagnostics().format_text(&degraded);
        assert!(text.starts_with("38.5 -92.25\n"));
        assert!(text.contains("converged:     false"));
        assert!(text.contains("non_finite_solution"));
        assert!(!text.contains("emission time"));
    }

    #[test]
    fn test_json_contains_diagnostics() {
        let json = JsonFormatter::new().format_json(&response(None)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["latitude_deg"], 38.5);
        assert_eq!(value["diagnostics"]["iterations"], 6);
        assert_eq!(value["diagnostics"]["converged"], true);

        let back: LocateResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, response(None));
    }

    #[test]
    fn test_csv_rows() {
        let csv = CsvFormatter::new().format_csv(&[
            response(None),
            response(Some(Degradation::DegenerateGeometry { spread_ratio: 0.0 })),
        ]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("latitude_deg,"));
        assert_eq!(lines[1], "38.5,-92.25,true,6,1.5e-13,-0.0001,none");
        assert_eq!(lines[2], "38.5,-92.25,false,6,1.5e-13,,degenerate_geometry");
    }
}
