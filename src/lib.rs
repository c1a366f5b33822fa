pub mod results;
pub mod fields;
pub mod format;
pub mod document;
pub mod provenance;

use std::path::PathBuf;

use log::{debug, info};

use fields::compute_virtual_fields;
use provenance::{ExportStage, ProvenanceLog, ProvenanceRecord};
use results::{Axis, NodeQuery, RegionQuery, ResultsSnapshot, ResultsSource};

// Re-exporting the pipeline entry points for easier access by callers.
pub use document::{build_document, to_pretty_xml, write_document, XmlElement};
pub use fields::{BoundingBox, VirtualField, VirtualFields};

/// Results snapshot read by the binary.
pub const DEFAULT_RESULTS_PATH: &str = "jobs/Biaxial.json";
/// Document written by the binary.
pub const DEFAULT_OUTPUT_PATH: &str = "VFMData.feb";

// --- Errors ---

#[derive(Debug, thiserror::Error)]
pub enum VfmError {
    #[error("Results file access failed: {0}")]
    FileAccess(String),
    #[error("Degenerate mesh bounds: {0}")]
    DegenerateBounds(String),
    #[error("Lookup failed: {0}")]
    Lookup(String),
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error("Writing output failed: {0}")]
    Output(String),
    #[error("Invalid VFM document: {0}")]
    Document(String),
}

// --- Configuration ---

/// Names and paths used by one export.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ExportConfig {
    pub results_path: PathBuf,
    pub output_path: PathBuf,
    pub displacement_field: String,
    pub reaction_field: String,
    pub x_load_region: String, // loads written from the x component
    pub y_load_region: String, // loads written from the y component
    pub echo_document: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            results_path: PathBuf::from(DEFAULT_RESULTS_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            displacement_field: "displacement".to_string(),
            reaction_field: "surface reaction force".to_string(),
            x_load_region: "PrescribedDisplacement2".to_string(),
            y_load_region: "PrescribedDisplacement3".to_string(),
            echo_document: true,
        }
    }
}

// --- Return Types ---

#[derive(Debug, serde::Serialize)]
pub struct ExportReport {
    pub output_path: PathBuf,
    pub time_steps: usize,
    pub node_count: usize,
    pub load_steps: usize,
    pub provenance_chain: Vec<ProvenanceRecord>,
}

// --- Pipeline ---

/// Loads the results snapshot named by `config` and exports it.
pub fn export_vfm_data(config: &ExportConfig) -> Result<ExportReport, VfmError> {
    let source = ResultsSnapshot::load(&config.results_path)?;
    export_from_source(&source, config)
}

/// Runs the whole export against any results source.
///
/// The document is built and serialized completely before the output file
/// is created, so a failure at any stage leaves no file behind.
pub fn export_from_source<S: ResultsSource + ?Sized>(
    source: &S,
    config: &ExportConfig,
) -> Result<ExportReport, VfmError> {
    let mut provenance = ProvenanceLog::new();

    // 1. Pull the three views out of the results
    let displacements = source.node_displacement(&NodeQuery::all(&config.displacement_field))?;
    let x_loads = source.face_region_series(&RegionQuery::new(
        &config.reaction_field,
        &config.x_load_region,
        Axis::X,
    ))?;
    let y_loads = source.face_region_series(&RegionQuery::new(
        &config.reaction_field,
        &config.y_load_region,
        Axis::Y,
    ))?;
    let coordinates = source.mesh_node_coordinates()?;
    info!(
        "Loaded {} time steps of '{}' for {} nodes, {} load steps.",
        displacements.time_steps(),
        config.displacement_field,
        displacements.node_count(),
        x_loads.time_steps()
    );

    let flat_displacements: Vec<f64> = displacements.values.iter().copied().collect();
    let results_payload = serde_json::to_vec(&(&coordinates, &flat_displacements, &x_loads.values, &y_loads.values))
        .map_err(|e| VfmError::Serialization(e.to_string()))?;
    let config_json = serde_json::to_value(config).map_err(|e| VfmError::Serialization(e.to_string()))?;
    provenance.record(
        ExportStage::ResultsLoaded,
        &results_payload,
        serde_json::json!({
            "config": config_json,
            "time_steps": displacements.time_steps(),
            "mesh_nodes": coordinates.len(),
        }),
    )?;

    // 2. Virtual fields from the mesh bounds
    let fields = compute_virtual_fields(&coordinates)?;
    debug!(
        "Mesh bounds x: [{}, {}], y: [{}, {}]",
        fields.bounds.min.x, fields.bounds.max.x, fields.bounds.min.y, fields.bounds.max.y
    );
    let fields_payload: Vec<[f64; 2]> = fields
        .ustar_x
        .values
        .iter()
        .zip(&fields.ustar_y.values)
        .map(|(ux, uy)| [ux.x, uy.y])
        .collect();
    let fields_payload =
        serde_json::to_vec(&fields_payload).map_err(|e| VfmError::Serialization(e.to_string()))?;
    provenance.record(
        ExportStage::FieldsComputed,
        &fields_payload,
        serde_json::json!({
            "min": [fields.bounds.min.x, fields.bounds.min.y, fields.bounds.min.z],
            "max": [fields.bounds.max.x, fields.bounds.max.y, fields.bounds.max.z],
        }),
    )?;

    // 3. Build, echo and write the document
    let document = build_document(&displacements, &fields, &x_loads, &y_loads)?;
    let xml = to_pretty_xml(&document)?;
    if config.echo_document {
        println!("{}", xml);
    }
    write_document(&config.output_path, &xml)?;

    let written = provenance.record(
        ExportStage::DocumentWritten,
        xml.as_bytes(),
        serde_json::json!({"output_path": config.output_path.display().to_string()}),
    )?;
    debug!("Document digest: {}", written.payload_digest);
    debug!("Provenance chain:\n{}", provenance.to_json()?);

    Ok(ExportReport {
        output_path: config.output_path.clone(),
        time_steps: displacements.time_steps(),
        node_count: fields.node_count(),
        load_steps: x_loads.time_steps(),
        provenance_chain: provenance.into_records(),
    })
}
