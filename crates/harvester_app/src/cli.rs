//! Command-line arguments for the `harvester` binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use harvester_core::Region;
use harvester_engine::RequestEncoding;
use log::LevelFilter;

#[derive(Debug, Parser)]
#[command(name = "harvester")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Harvests every feature of a region from an offset-capped WFS feed")]
pub struct Cli {
    /// RON config file; built-in defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Layer to harvest by name (repeatable); all configured layers by default
    #[arg(short, long = "layer")]
    pub layers: Vec<String>,

    /// Print the configured layers and exit
    #[arg(long)]
    pub list: bool,

    /// Target region as `minx,miny,maxx,maxy`
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    pub bbox: Option<Region>,

    /// Query the whole dataset without a spatial restriction
    #[arg(long, conflicts_with = "bbox")]
    pub all: bool,

    /// Directory for the GeoJSON output
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Sub-regions walked at the same time
    #[arg(long)]
    pub concurrency: Option<usize>,

    #[arg(long, value_enum)]
    pub encoding: Option<EncodingArg>,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EncodingArg {
    /// BBOX query parameter
    Bbox,
    /// OGC filter expression
    Filter,
}

impl From<EncodingArg> for RequestEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Bbox => RequestEncoding::PlainBbox,
            EncodingArg::Filter => RequestEncoding::FilterExpression,
        }
    }
}

pub fn parse_bbox(input: &str) -> Result<Region, String> {
    let values = input
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("invalid coordinate: {err}"))?;
    let &[min_x, min_y, max_x, max_y] = values.as_slice() else {
        return Err(format!("expected 4 coordinates, got {}", values.len()));
    };
    Region::new(min_x, min_y, max_x, max_y).map_err(|err| err.to_string())
}
