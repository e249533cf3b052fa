//! Pipe-delimited wire grammar spoken between the control tasks and the
//! persistence daemon.
//!
//! Every message is a single UTF-8 line, `TAG|FIELD|FIELD|...`. The grammar
//! is kept as a serialization boundary (rather than sending typed values
//! through the channel) so the daemon can later be split out to another
//! process or host without touching the producers.

use anyhow::{anyhow, bail, Result};
use std::fmt;

use crate::db::models::{AlertKind, LogCategory, RecKind};

/// A parsed wire message. `encode`/`parse` round-trip for every variant.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// `SENSOR|TEMP|PH|EC`
    Sensor { temperature: f64, ph: f64, ec: f64 },
    /// `LOG|CATEGORY|TITLE|DETAIL`
    Log {
        category: LogCategory,
        title: String,
        detail: String,
    },
    /// `ALERT|KIND|MESSAGE[|DETAIL]`
    Alert {
        kind: AlertKind,
        message: String,
        detail: Option<String>,
    },
    /// `IMG|FILENAME|PATH`
    Image { filename: String, path: String },
    /// `PRED|FILENAME|LABEL|CONFIDENCE`
    Prediction {
        filename: String,
        label: String,
        confidence: f64,
    },
    /// `REC|FILENAME|KIND|TEXT|CONFIDENCE`
    Recommendation {
        filename: String,
        kind: RecKind,
        text: String,
        confidence: f64,
    },
}

impl WireMessage {
    /// Serializes to the wire format.
    ///
    /// Fields containing the delimiter or newlines cannot be represented and
    /// are rejected, as are filenames containing quotes (untranslatable per
    /// the persistence layer's contract).
    pub fn encode(&self) -> Result<String> {
        match self {
            WireMessage::Sensor {
                temperature,
                ph,
                ec,
            } => Ok(format!("SENSOR|{temperature}|{ph}|{ec}")),
            WireMessage::Log {
                category,
                title,
                detail,
            } => {
                check_field("log title", title)?;
                check_field("log detail", detail)?;
                Ok(format!("LOG|{}|{title}|{detail}", category.as_str()))
            }
            WireMessage::Alert {
                kind,
                message,
                detail,
            } => {
                check_field("alert message", message)?;
                match detail {
                    Some(detail) => {
                        check_field("alert detail", detail)?;
                        Ok(format!("ALERT|{}|{message}|{detail}", kind.as_str()))
                    }
                    None => Ok(format!("ALERT|{}|{message}", kind.as_str())),
                }
            }
            WireMessage::Image { filename, path } => {
                check_filename(filename)?;
                check_field("image path", path)?;
                Ok(format!("IMG|{filename}|{path}"))
            }
            WireMessage::Prediction {
                filename,
                label,
                confidence,
            } => {
                check_filename(filename)?;
                check_field("prediction label", label)?;
                Ok(format!("PRED|{filename}|{label}|{confidence}"))
            }
            WireMessage::Recommendation {
                filename,
                kind,
                text,
                confidence,
            } => {
                check_filename(filename)?;
                check_field("recommendation text", text)?;
                Ok(format!(
                    "REC|{filename}|{}|{text}|{confidence}",
                    kind.as_str()
                ))
            }
        }
    }

    /// Parses one wire line. Unknown tags and malformed payloads are errors;
    /// the daemon logs and drops them without aborting.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split('|').collect();
        let tag = *parts.first().ok_or_else(|| anyhow!("empty message"))?;

        match tag {
            "SENSOR" => {
                expect_fields(raw, &parts, 4)?;
                Ok(WireMessage::Sensor {
                    temperature: parse_number(parts[1], "temperature")?,
                    ph: parse_number(parts[2], "ph")?,
                    ec: parse_number(parts[3], "ec")?,
                })
            }
            "LOG" => {
                expect_fields(raw, &parts, 4)?;
                Ok(WireMessage::Log {
                    category: LogCategory::parse(parts[1])?,
                    title: parts[2].to_string(),
                    detail: parts[3].to_string(),
                })
            }
            "ALERT" => {
                if parts.len() < 3 {
                    bail!("ALERT needs at least 3 fields, got {}: {raw:?}", parts.len());
                }
                Ok(WireMessage::Alert {
                    kind: AlertKind::parse(parts[1])?,
                    message: parts[2].to_string(),
                    detail: parts.get(3).map(|s| s.to_string()),
                })
            }
            "IMG" => {
                expect_fields(raw, &parts, 3)?;
                Ok(WireMessage::Image {
                    filename: parts[1].to_string(),
                    path: parts[2].to_string(),
                })
            }
            "PRED" => {
                expect_fields(raw, &parts, 4)?;
                Ok(WireMessage::Prediction {
                    filename: parts[1].to_string(),
                    label: parts[2].to_string(),
                    confidence: parse_number(parts[3], "confidence")?,
                })
            }
            "REC" => {
                expect_fields(raw, &parts, 5)?;
                Ok(WireMessage::Recommendation {
                    filename: parts[1].to_string(),
                    kind: RecKind::parse(parts[2])?,
                    text: parts[3].to_string(),
                    confidence: parse_number(parts[4], "confidence")?,
                })
            }
            other => bail!("unknown message tag {other:?}"),
        }
    }
}

impl fmt::Display for WireMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Ok(line) => f.write_str(&line),
            Err(_) => f.write_str("<unencodable message>"),
        }
    }
}

fn check_field(what: &str, value: &str) -> Result<()> {
    if value.contains('|') || value.contains('\n') {
        bail!("{what} contains wire delimiter or newline: {value:?}");
    }
    Ok(())
}

fn check_filename(value: &str) -> Result<()> {
    check_field("filename", value)?;
    if value.contains('\'') || value.contains('"') {
        bail!("filename contains quotes: {value:?}");
    }
    Ok(())
}

fn expect_fields(raw: &str, parts: &[&str], want: usize) -> Result<()> {
    if parts.len() != want {
        bail!(
            "{} needs {want} fields, got {}: {raw:?}",
            parts[0],
            parts.len()
        );
    }
    Ok(())
}

fn parse_number(field: &str, what: &str) -> Result<f64> {
    field
        .parse::<f64>()
        .map_err(|_| anyhow!("{what} is not a number: {field:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_round_trip() {
        let msg = WireMessage::Sensor {
            temperature: 21.0,
            ph: 5.0,
            ec: 700.0,
        };
        let line = msg.encode().unwrap();
        assert_eq!(line, "SENSOR|21|5|700");
        assert_eq!(WireMessage::parse(&line).unwrap(), msg);
    }

    #[test]
    fn every_tag_round_trips() {
        let messages = vec![
            WireMessage::Sensor {
                temperature: 18.5,
                ph: 6.25,
                ec: 560.0,
            },
            WireMessage::Log {
                category: LogCategory::MlAnalysis,
                title: "Out-of-Distribution Detected".into(),
                detail: "Entropy: 1.95".into(),
            },
            WireMessage::Alert {
                kind: AlertKind::Critical,
                message: "Disease detected with 82% confidence".into(),
                detail: None,
            },
            WireMessage::Alert {
                kind: AlertKind::Warning,
                message: "pH drifting".into(),
                detail: Some("Reading 4.9".into()),
            },
            WireMessage::Image {
                filename: "plant_20250101_120000.jpg".into(),
                path: "/opt/leafsense/gallery/plant_20250101_120000.jpg".into(),
            },
            WireMessage::Prediction {
                filename: "plant_20250101_120000.jpg".into(),
                label: "Healthy".into(),
                confidence: 0.97,
            },
            WireMessage::Recommendation {
                filename: "plant_20250101_120000.jpg".into(),
                kind: RecKind::Disease,
                text: "Disease detected. IMMEDIATE ACTIONS: ...".into(),
                confidence: 0.82,
            },
        ];

        for msg in messages {
            let line = msg.encode().unwrap();
            assert_eq!(WireMessage::parse(&line).unwrap(), msg, "line {line:?}");
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(WireMessage::parse("BOGUS|1|2").is_err());
        assert!(WireMessage::parse("").is_err());
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(WireMessage::parse("SENSOR|21|5").is_err());
        assert!(WireMessage::parse("SENSOR|21|abc|700").is_err());
        assert!(WireMessage::parse("LOG|NotACategory|t|d").is_err());
        assert!(WireMessage::parse("ALERT|Critical").is_err());
        assert!(WireMessage::parse("REC|f|Disease|text").is_err());
    }

    #[test]
    fn delimiter_in_field_is_unencodable() {
        let msg = WireMessage::Log {
            category: LogCategory::Maintenance,
            title: "bad|title".into(),
            detail: "".into(),
        };
        assert!(msg.encode().is_err());
    }

    #[test]
    fn quoted_filename_is_unencodable() {
        let msg = WireMessage::Image {
            filename: "plant'; drop.jpg".into(),
            path: "/tmp/x.jpg".into(),
        };
        assert!(msg.encode().is_err());
    }
}
