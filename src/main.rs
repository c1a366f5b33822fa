// src/main.rs

//! Exports `jobs/Biaxial` results into `VFMData.feb` in the working directory.

use std::process;

use log::{error, info, LevelFilter};
use vfm_export::{export_vfm_data, ExportConfig};

fn main() {
    env_logger::Builder::new().filter_level(LevelFilter::Info).init();

    let config = ExportConfig::default();
    match export_vfm_data(&config) {
        Ok(report) => {
            info!(
                "Wrote {} ({} time steps, {} nodes, {} load steps).",
                report.output_path.display(),
                report.time_steps,
                report.node_count,
                report.load_steps
            );
        }
        Err(e) => {
            error!("VFM export failed: {}", e);
            process::exit(1);
        }
    }
}
